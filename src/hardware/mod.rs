//! Virtual CPUs that organisms run on.
//!
//! Two flavors share one [`HardwareCore`]:
//!
//! - [`HeadsCpu`]: registers AX/BX/CX, four heads, a local and a global stack
//! - [`StackCpu`]: four stacks (three local, one global), four heads
//!
//! Both execute genomes written against an [`InstructionSet`] and talk to
//! their owner only through [`OrgInterface`].

pub mod base;
pub mod context;
pub mod cost;
pub mod errors;
pub mod fault;
pub mod genome;
pub mod head;
pub mod heads_cpu;
pub mod interface;
pub mod isa;
pub mod label;
pub mod memory;
pub mod merit;
pub mod mutation;
pub mod snapshot;
pub mod stack;
pub mod stack_cpu;
pub mod thread;

#[cfg(test)]
mod isa_static_check;

use crate::config::HardwareConfig;
use base::HardwareCore;
use context::AvidaContext;
use cost::ExecCounters;
use errors::HardwareError;
use fault::Fault;
use genome::Genome;
use heads_cpu::HeadsCpu;
use interface::OrgInterface;
use isa::{HardwareKind, InstructionSet};
use memory::CpuMemory;
use snapshot::HardwareSnapshot;
use stack_cpu::StackCpu;
use std::sync::Arc;
use thread::ExecutionThread;

/// An organism's CPU.
///
/// Implementors supply their core and a tick; everything else has a shared
/// default.
pub trait Hardware: Send {
    fn kind(&self) -> HardwareKind;

    fn core(&self) -> &HardwareCore;

    fn core_mut(&mut self) -> &mut HardwareCore;

    /// Runs one tick: pays costs or executes one instruction per scheduled
    /// thread.
    fn single_process(&mut self, ctx: &mut AvidaContext, org: &mut dyn OrgInterface);

    fn reset(&mut self) {
        self.core_mut().reset();
    }

    /// Replaces memory with `genome` and resets all threads.
    fn load_genome(&mut self, genome: &Genome) -> Result<(), HardwareError> {
        self.core_mut().load_genome(genome)
    }

    fn divide(
        &mut self,
        ctx: &mut AvidaContext,
        org: &mut dyn OrgInterface,
        div_point: usize,
        extra_lines: usize,
    ) -> bool {
        self.core_mut().divide(ctx, org, div_point, extra_lines)
    }

    fn fork_thread(&mut self) -> bool {
        self.core_mut().fork_thread()
    }

    fn kill_thread(&mut self) -> bool {
        self.core_mut().kill_thread()
    }

    fn memory(&self) -> &CpuMemory {
        &self.core().memory
    }

    fn memory_mut(&mut self) -> &mut CpuMemory {
        &mut self.core_mut().memory
    }

    fn num_threads(&self) -> usize {
        self.core().threads.len()
    }

    fn cur_thread(&self) -> usize {
        self.core().cur_thread
    }

    fn thread(&self, index: usize) -> Option<&ExecutionThread> {
        self.core().threads.get(index)
    }

    fn counters(&self) -> &ExecCounters {
        &self.core().counters
    }

    fn last_fault(&self) -> Option<&Fault> {
        self.core().last_fault.as_ref()
    }

    fn snapshot(&self) -> HardwareSnapshot {
        HardwareSnapshot::capture(self.kind(), self.core())
    }

    fn restore(&mut self, snapshot: &HardwareSnapshot) -> Result<(), HardwareError> {
        let kind = self.kind();
        snapshot.apply(kind, self.core_mut())
    }
}

/// Builds hardware of `kind`. The instruction set must have been built for
/// the same kind.
pub fn create_hardware(
    kind: HardwareKind,
    inst_set: Arc<InstructionSet>,
    config: Arc<HardwareConfig>,
) -> Result<Box<dyn Hardware>, HardwareError> {
    if inst_set.kind() != kind {
        return Err(HardwareError::Config {
            line: 0,
            reason: format!(
                "instruction set for {} hardware used with {} hardware",
                inst_set.kind().name(),
                kind.name()
            ),
        });
    }
    Ok(match kind {
        HardwareKind::Heads => Box::new(HeadsCpu::new(inst_set, config)),
        HardwareKind::FourStack => Box::new(StackCpu::new(inst_set, config)),
    })
}
