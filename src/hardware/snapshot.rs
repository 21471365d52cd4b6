//! Hardware checkpoints.
//!
//! A snapshot holds everything needed to resume an organism's CPU exactly:
//! memory with flags, all threads, the global stack, cost countdowns and
//! counters. The instruction set and configuration are not included; a
//! snapshot is restored into hardware built with the same ones.
//!
//! # Binary format
//!
//! `b"AVIDA"`, a little-endian `u16` version, then the [`HardwareSnapshot`]
//! fields in declaration order (see [`crate::types::encoding`]).

use crate::hardware::base::HardwareCore;
use crate::hardware::cost::{CostTracker, ExecCounters};
use crate::hardware::errors::HardwareError;
use crate::hardware::isa::HardwareKind;
use crate::hardware::memory::CpuMemory;
use crate::hardware::stack::CpuStack;
use crate::hardware::thread::ExecutionThread;
use crate::types::encoding::{Decode, Encode};
use avida_derive::BinaryCodec;

pub const MAGIC: &[u8; 5] = b"AVIDA";
pub const VERSION: u16 = 1;

#[derive(Clone, Debug, PartialEq, Eq, BinaryCodec)]
pub struct HardwareSnapshot {
    pub kind: HardwareKind,
    pub memory: CpuMemory,
    pub threads: Vec<ExecutionThread>,
    pub global_stack: CpuStack,
    pub cur_thread: usize,
    pub thread_id_chart: u64,
    pub mal_active: bool,
    pub advance_ip: bool,
    pub costs: CostTracker,
    pub counters: ExecCounters,
    pub genome_len: usize,
}

impl HardwareSnapshot {
    pub fn capture(kind: HardwareKind, core: &HardwareCore) -> Self {
        Self {
            kind,
            memory: core.memory.clone(),
            threads: core.threads.clone(),
            global_stack: core.global_stack.clone(),
            cur_thread: core.cur_thread,
            thread_id_chart: core.thread_id_chart,
            mal_active: core.mal_active,
            advance_ip: core.advance_ip,
            costs: core.costs.clone(),
            counters: core.counters.clone(),
            genome_len: core.genome_len,
        }
    }

    /// Writes this snapshot into `core`, which must belong to hardware of
    /// the same kind.
    pub fn apply(&self, kind: HardwareKind, core: &mut HardwareCore) -> Result<(), HardwareError> {
        if self.kind != kind {
            return Err(HardwareError::SnapshotMismatch {
                expected: kind.name(),
            });
        }
        if self.threads.is_empty() || self.cur_thread >= self.threads.len() {
            return Err(HardwareError::Decode {
                reason: "snapshot thread table is inconsistent".to_string(),
            });
        }
        core.memory = self.memory.clone();
        core.threads = self.threads.clone();
        core.global_stack = self.global_stack.clone();
        core.cur_thread = self.cur_thread;
        core.thread_id_chart = self.thread_id_chart;
        core.mal_active = self.mal_active;
        core.advance_ip = self.advance_ip;
        core.costs = self.costs.clone();
        core.counters = self.counters.clone();
        core.genome_len = self.genome_len;
        core.last_fault = None;
        Ok(())
    }

    pub fn to_checkpoint(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(MAGIC.len() + 2);
        out.extend_from_slice(MAGIC);
        out.extend_from_slice(&VERSION.to_le_bytes());
        out.extend_from_slice(&self.to_bytes());
        out
    }

    /// Parses [`Self::to_checkpoint`] output. Rejects a bad header, an
    /// unknown version, truncated data and trailing bytes.
    pub fn from_checkpoint(data: &[u8]) -> Result<Self, HardwareError> {
        let body = data.strip_prefix(MAGIC.as_slice()).ok_or_else(|| HardwareError::Decode {
            reason: "missing checkpoint header".to_string(),
        })?;
        let mut input = body;
        let version = u16::decode(&mut input)?;
        if version != VERSION {
            return Err(HardwareError::Decode {
                reason: format!("unsupported checkpoint version {}", version),
            });
        }
        Ok(Self::from_bytes(input)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::HardwareConfig;
    use crate::hardware::context::{AvidaContext, ContextSnapshot};
    use crate::hardware::interface::tests::TestInterface;
    use crate::hardware::isa::InstructionSet;
    use crate::hardware::{Hardware, create_hardware};
    use crate::utils::test_utils::utils::heads_ancestor;
    use std::sync::Arc;

    fn running_cpu(ticks: usize) -> Box<dyn Hardware> {
        let set = Arc::new(InstructionSet::default_for(HardwareKind::Heads));
        let mut hw = create_hardware(HardwareKind::Heads, Arc::clone(&set), Arc::new(HardwareConfig::default()))
            .unwrap();
        hw.load_genome(&heads_ancestor(&set)).unwrap();
        let mut ctx = AvidaContext::new(3);
        let mut org = TestInterface::new();
        for _ in 0..ticks {
            hw.single_process(&mut ctx, &mut org);
        }
        hw
    }

    #[test]
    fn checkpoint_restores_identical_state() {
        let hw = running_cpu(150);
        let bytes = hw.snapshot().to_checkpoint();
        let decoded = HardwareSnapshot::from_checkpoint(&bytes).unwrap();
        assert_eq!(decoded, hw.snapshot());

        let mut fresh = running_cpu(0);
        fresh.restore(&decoded).unwrap();
        assert_eq!(fresh.snapshot(), hw.snapshot());
    }

    #[test]
    fn resumed_run_matches_uninterrupted_run() {
        let set = Arc::new(InstructionSet::default_for(HardwareKind::Heads));
        // Default rates: copy mutations draw from the random stream.
        let config = Arc::new(HardwareConfig::default());
        let mut hw = create_hardware(HardwareKind::Heads, Arc::clone(&set), Arc::clone(&config)).unwrap();
        hw.load_genome(&heads_ancestor(&set)).unwrap();
        let mut ctx = AvidaContext::new(11);
        let mut org = TestInterface::new();
        for _ in 0..200 {
            hw.single_process(&mut ctx, &mut org);
        }

        let hw_bytes = hw.snapshot().to_checkpoint();
        let ctx_bytes = ctx.snapshot().to_bytes();

        let mut original = TestInterface::new();
        for _ in 0..800 {
            hw.single_process(&mut ctx, &mut original);
        }

        let mut resumed_hw = create_hardware(HardwareKind::Heads, Arc::clone(&set), config).unwrap();
        resumed_hw
            .restore(&HardwareSnapshot::from_checkpoint(&hw_bytes).unwrap())
            .unwrap();
        let mut resumed_ctx = AvidaContext::restore(&ContextSnapshot::from_bytes(&ctx_bytes).unwrap());
        let mut resumed = TestInterface::new();
        for _ in 0..800 {
            resumed_hw.single_process(&mut resumed_ctx, &mut resumed);
        }

        assert_eq!(resumed_hw.snapshot(), hw.snapshot());
        assert_eq!(resumed_ctx.snapshot(), ctx.snapshot());
        assert!(!original.offspring.is_empty());
        let genomes = |org: &TestInterface| org.offspring.iter().map(|o| o.genome.clone()).collect::<Vec<_>>();
        assert_eq!(genomes(&resumed), genomes(&original));
    }

    #[test]
    fn corrupted_checkpoints_are_rejected() {
        let bytes = running_cpu(10).snapshot().to_checkpoint();

        let mut bad_magic = bytes.clone();
        bad_magic[0] = b'X';
        assert!(HardwareSnapshot::from_checkpoint(&bad_magic).is_err());

        let mut bad_version = bytes.clone();
        bad_version[MAGIC.len()] = 9;
        assert!(HardwareSnapshot::from_checkpoint(&bad_version).is_err());

        let mut trailing = bytes.clone();
        trailing.push(0);
        assert!(HardwareSnapshot::from_checkpoint(&trailing).is_err());

        assert!(HardwareSnapshot::from_checkpoint(&bytes[..bytes.len() - 1]).is_err());
    }

    #[test]
    fn restore_rejects_other_hardware() {
        let snapshot = running_cpu(5).snapshot();
        let set = Arc::new(InstructionSet::default_for(HardwareKind::FourStack));
        let mut stack = create_hardware(HardwareKind::FourStack, set, Arc::new(HardwareConfig::default()))
            .unwrap();
        assert_eq!(
            stack.restore(&snapshot).unwrap_err(),
            HardwareError::SnapshotMismatch { expected: "4stack" }
        );
    }
}
