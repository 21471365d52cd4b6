//! State and behaviour shared by every hardware flavor.
//!
//! [`HardwareCore`] owns the memory, threads and counters; the concrete CPUs
//! wrap it and add their instruction handlers. Allocation, divide,
//! viability, thread management, label reading and nop-modifier decoding
//! all live here so both CPUs apply identical rules.

use crate::config::{AllocMethod, DivideMethod, HardwareConfig, ThreadSlicing};
use crate::hardware::context::AvidaContext;
use crate::hardware::cost::{CostTracker, Counter, ExecCounters};
use crate::hardware::errors::HardwareError;
use crate::hardware::fault::{Fault, FaultLocation};
use crate::hardware::genome::Genome;
use crate::hardware::head::{Head, HeadKind};
use crate::hardware::interface::{OrgInterface, Offspring};
use crate::hardware::isa::{Instruction, InstructionSet};
use crate::hardware::label::{CodeLabel, find_label_backward, find_label_forward};
use crate::hardware::memory::{CpuMemory, SiteFlags};
use crate::hardware::merit::{Merit, calc_size_merit};
use crate::hardware::mutation::{MutationContext, MutationLog, apply_mutations};
use crate::hardware::stack::CpuStack;
use crate::hardware::thread::ExecutionThread;
use crate::hardware::Hardware;
use std::sync::Arc;

/// Instruction handler: returns false when the instruction failed.
pub type Handler<H> = fn(&mut H, &mut AvidaContext, &mut dyn OrgInterface) -> bool;

/// Register and stack counts of one hardware flavor.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ThreadLayout {
    pub registers: usize,
    pub local_stacks: usize,
}

/// Search direction for [`HardwareCore::find_label`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Direction {
    Forward,
    Backward,
}

#[derive(Clone, Debug)]
pub struct HardwareCore {
    pub inst_set: Arc<InstructionSet>,
    pub config: Arc<HardwareConfig>,
    pub layout: ThreadLayout,
    pub memory: CpuMemory,
    pub threads: Vec<ExecutionThread>,
    pub global_stack: CpuStack,
    pub cur_thread: usize,
    /// Bit `i` set when thread id `i` is in use.
    pub thread_id_chart: u64,
    /// An allocation is waiting for a divide.
    pub mal_active: bool,
    /// Cleared by handlers that place the IP themselves.
    pub advance_ip: bool,
    pub costs: CostTracker,
    pub counters: ExecCounters,
    /// Length of the genome this organism was born with.
    pub genome_len: usize,
    pub last_fault: Option<Fault>,
}

impl HardwareCore {
    pub fn new(
        inst_set: Arc<InstructionSet>,
        config: Arc<HardwareConfig>,
        layout: ThreadLayout,
    ) -> Self {
        let memory = CpuMemory::new(config.memory_limit());
        let costs = CostTracker::new(&inst_set);
        let mut core = Self {
            inst_set,
            config,
            layout,
            memory,
            threads: Vec::new(),
            global_stack: CpuStack::new(),
            cur_thread: 0,
            thread_id_chart: 0,
            mal_active: false,
            advance_ip: true,
            costs,
            counters: ExecCounters::new(),
            genome_len: 0,
            last_fault: None,
        };
        core.reset();
        core
    }

    /// Back to a single fresh thread; memory content is kept.
    pub fn reset(&mut self) {
        self.threads.clear();
        self.threads.push(ExecutionThread::new(
            0,
            self.layout.registers,
            self.layout.local_stacks,
        ));
        self.thread_id_chart = 1;
        self.cur_thread = 0;
        self.global_stack.clear();
        self.mal_active = false;
        self.costs.reset(&self.inst_set);
        self.counters.reset();
        self.last_fault = None;
    }

    pub fn load_genome(&mut self, genome: &Genome) -> Result<(), HardwareError> {
        if let Some(bad) = genome.instructions().iter().find(|i| !self.inst_set.contains(**i)) {
            return Err(HardwareError::UnknownInstruction {
                id: bad.op(),
                size: self.inst_set.size(),
            });
        }
        self.memory.load(genome)?;
        self.genome_len = genome.len();
        self.reset();
        Ok(())
    }

    // =========================
    // Threads and heads
    // =========================

    #[inline]
    pub fn thread(&self) -> &ExecutionThread {
        &self.threads[self.cur_thread]
    }

    #[inline]
    pub fn thread_mut(&mut self) -> &mut ExecutionThread {
        &mut self.threads[self.cur_thread]
    }

    #[inline]
    pub fn head(&self, kind: HeadKind) -> Head {
        *self.thread().head(kind)
    }

    #[inline]
    pub fn head_pos(&self, kind: HeadKind) -> usize {
        self.thread().head(kind).position()
    }

    pub fn set_head(&mut self, kind: HeadKind, position: usize) {
        let len = self.memory.len();
        self.thread_mut().head_mut(kind).set(position, len);
    }

    pub fn set_head_signed(&mut self, kind: HeadKind, position: i64) {
        let len = self.memory.len();
        self.thread_mut().head_mut(kind).set_signed(position, len);
    }

    pub fn advance_head(&mut self, kind: HeadKind) {
        let len = self.memory.len();
        self.thread_mut().head_mut(kind).advance(len);
    }

    pub fn jump_head(&mut self, kind: HeadKind, offset: i64) {
        let len = self.memory.len();
        self.thread_mut().head_mut(kind).jump(offset, len);
    }

    pub fn adjust_head(&mut self, kind: HeadKind) {
        let len = self.memory.len();
        self.thread_mut().head_mut(kind).adjust(len);
    }

    /// Brings every head of every thread back inside memory.
    pub fn adjust_heads(&mut self) {
        let len = self.memory.len();
        for thread in &mut self.threads {
            for head in &mut thread.heads {
                head.adjust(len);
            }
        }
    }

    pub fn inst_at(&self, kind: HeadKind) -> Instruction {
        self.memory
            .get(self.head_pos(kind))
            .unwrap_or_else(|_| self.inst_set.default_instruction())
    }

    pub fn set_flag_at(&mut self, kind: HeadKind, bit: u8) {
        let pos = self.head_pos(kind);
        let _ = self.memory.set_flag(pos, bit);
    }

    pub fn thread_next(&mut self) {
        self.cur_thread = (self.cur_thread + 1) % self.threads.len();
    }

    pub fn thread_prev(&mut self) {
        let n = self.threads.len();
        self.cur_thread = (self.cur_thread + n - 1) % n;
    }

    pub fn cur_thread_id(&self) -> u32 {
        self.thread().id
    }

    /// Copies the current thread under the lowest free id.
    pub fn fork_thread(&mut self) -> bool {
        let n = self.threads.len();
        if n >= self.config.max_cpu_threads.min(64) {
            return false;
        }
        let new_id = (!self.thread_id_chart).trailing_zeros();
        let mut thread = self.thread().clone();
        thread.id = new_id;
        self.threads.push(thread);
        self.thread_id_chart |= 1u64 << new_id;
        self.counters.bump(Counter::Forks);
        true
    }

    /// Removes the current thread; the last thread takes its slot.
    pub fn kill_thread(&mut self) -> bool {
        if self.threads.len() == 1 {
            return false;
        }
        let killed = self.cur_thread;
        self.thread_prev();
        self.thread_id_chart &= !(1u64 << self.threads[killed].id);
        self.threads.swap_remove(killed);
        if self.cur_thread > killed {
            self.cur_thread -= 1;
        }
        if self.cur_thread >= self.threads.len() {
            self.cur_thread = 0;
        }
        true
    }

    // =========================
    // Stacks
    // =========================

    /// Local stack `index`, or the global stack past the local ones.
    pub fn stack(&self, index: usize) -> &CpuStack {
        let thread = &self.threads[self.cur_thread];
        thread.stacks.get(index).unwrap_or(&self.global_stack)
    }

    pub fn stack_mut(&mut self, index: usize) -> &mut CpuStack {
        let thread = &mut self.threads[self.cur_thread];
        match thread.stacks.get_mut(index) {
            Some(stack) => stack,
            None => &mut self.global_stack,
        }
    }

    pub fn stack_push(&mut self, index: usize, value: i32) {
        self.stack_mut(index).push(value);
    }

    /// Pops, reporting an empty stack and yielding 0.
    pub fn stack_pop(&mut self, org: &mut dyn OrgInterface, index: usize) -> i32 {
        match self.stack_mut(index).pop() {
            Some(value) => value,
            None => {
                self.fault(org, Fault::warning(FaultLocation::Stack, "pop from empty stack"));
                0
            }
        }
    }

    /// Top value, reporting an empty stack and yielding 0.
    pub fn stack_top(&mut self, org: &mut dyn OrgInterface, index: usize) -> i32 {
        match self.stack(index).top() {
            Some(value) => value,
            None => {
                self.fault(org, Fault::warning(FaultLocation::Stack, "read from empty stack"));
                0
            }
        }
    }

    // =========================
    // Faults
    // =========================

    pub fn fault(&mut self, org: &mut dyn OrgInterface, fault: Fault) {
        self.counters.bump(Counter::Faults);
        self.last_fault = Some(fault.clone());
        org.fault(fault);
    }

    // =========================
    // Nop modifiers and labels
    // =========================

    /// If the instruction after the IP is a nop, steps onto it, marks it
    /// executed and returns its modifier.
    fn take_modifier(&mut self) -> Option<u8> {
        let len = self.memory.len();
        if len == 0 {
            return None;
        }
        let next = (self.head_pos(HeadKind::Ip) + 1) % len;
        let nop = self.memory.get(next).ok().and_then(|i| self.inst_set.nop_mod(i))?;
        self.advance_head(HeadKind::Ip);
        self.set_flag_at(HeadKind::Ip, SiteFlags::EXECUTED);
        Some(nop)
    }

    pub fn next_register(&self, reg: usize) -> usize {
        (reg + 1) % self.layout.registers.max(1)
    }

    pub fn find_modified_register(&mut self, default: usize) -> usize {
        match self.take_modifier() {
            Some(nop) => nop as usize % self.layout.registers.max(1),
            None => default,
        }
    }

    /// Modified register, or the successor of `default` when unmodified.
    pub fn find_modified_next_register(&mut self, default: usize) -> usize {
        match self.take_modifier() {
            Some(nop) => nop as usize % self.layout.registers.max(1),
            None => self.next_register(default),
        }
    }

    /// Modified register, or the predecessor of `default` when unmodified.
    pub fn find_modified_previous_register(&mut self, default: usize) -> usize {
        let n = self.layout.registers.max(1);
        match self.take_modifier() {
            Some(nop) => nop as usize % n,
            None => (default + n - 1) % n,
        }
    }

    pub fn find_modified_head(&mut self, default: HeadKind) -> HeadKind {
        match self.take_modifier() {
            Some(nop) => HeadKind::from_index(nop as usize),
            None => default,
        }
    }

    /// Stack index; one past the local stacks is the global stack.
    pub fn find_modified_stack(&mut self, default: usize) -> usize {
        match self.take_modifier() {
            Some(nop) => nop as usize % (self.layout.local_stacks + 1),
            None => default,
        }
    }

    /// Reads the nops after the IP into the thread's `next_label`, moving
    /// the IP onto the last one.
    pub fn read_label(&mut self) {
        let max_exe = self.config.max_label_exe_size;
        self.thread_mut().next_label.clear();
        let mut count = 0;
        while count < crate::hardware::label::MAX_LABEL_SIZE {
            let len = self.memory.len();
            if len == 0 {
                break;
            }
            let next = (self.head_pos(HeadKind::Ip) + 1) % len;
            let Some(nop) = self.memory.get(next).ok().and_then(|i| self.inst_set.nop_mod(i)) else {
                break;
            };
            count += 1;
            self.advance_head(HeadKind::Ip);
            self.thread_mut().next_label.add_nop(nop);
            if self.thread().next_label.len() <= max_exe {
                self.set_flag_at(HeadKind::Ip, SiteFlags::EXECUTED);
            }
        }
    }

    /// Feeds a copied instruction into the read label.
    pub fn read_inst(&mut self, inst: Instruction) {
        let nop = self.inst_set.nop_mod(inst);
        let label = &mut self.thread_mut().read_label;
        match nop {
            Some(nop) => label.add_nop(nop),
            None => label.clear(),
        }
    }

    /// Finds `next_label` and returns the position of its last nop, or the
    /// IP when the label is empty or missing.
    pub fn find_label(&self, direction: Direction) -> (usize, bool) {
        let ip = self.head_pos(HeadKind::Ip);
        let label: &CodeLabel = &self.thread().next_label;
        if label.is_empty() {
            return (ip, false);
        }
        let found = match direction {
            Direction::Forward => find_label_forward(label, &self.memory, &self.inst_set, ip),
            Direction::Backward => find_label_backward(
                label,
                &self.memory,
                &self.inst_set,
                ip as isize - label.len() as isize,
            ),
        };
        match found {
            Some(end) => {
                let mut head = Head::new(0);
                head.set_signed(end as i64 - 1, self.memory.len());
                (head.position(), true)
            }
            None => (ip, false),
        }
    }

    // =========================
    // Copying
    // =========================

    /// Copies READ to WRITE, applying a copy mutation with the configured
    /// probability, and advances both heads.
    pub fn head_copy(&mut self, ctx: &mut AvidaContext) {
        self.adjust_head(HeadKind::Read);
        self.adjust_head(HeadKind::Write);
        let mut inst = self.inst_at(HeadKind::Read);
        self.read_inst(inst);
        let write = self.head_pos(HeadKind::Write);
        if ctx.chance(self.config.mutations.copy_mut_prob) {
            inst = self.inst_set.random_instruction(ctx.rng());
            let _ = self.memory.set_flag(write, SiteFlags::MUTATED);
            let _ = self.memory.set_flag(write, SiteFlags::COPY_MUT);
            self.counters.bump(Counter::CopyMutations);
        }
        self.counters.bump(Counter::Copies);
        let _ = self.memory.set(write, inst);
        let _ = self.memory.set_flag(write, SiteFlags::COPIED);
        self.advance_head(HeadKind::Read);
        self.advance_head(HeadKind::Write);
    }

    /// Instruction under `head`, replaced by a random one on a copy
    /// mutation. Advances the head.
    pub fn head_read(&mut self, ctx: &mut AvidaContext, head: HeadKind) -> Instruction {
        self.adjust_head(head);
        let inst = if ctx.chance(self.config.mutations.copy_mut_prob) {
            self.counters.bump(Counter::CopyMutations);
            self.inst_set.random_instruction(ctx.rng())
        } else {
            self.inst_at(head)
        };
        self.read_inst(inst);
        self.counters.bump(Counter::Copies);
        self.advance_head(head);
        inst
    }

    /// Writes opcode `value` under `head` (out-of-range values write opcode
    /// 0), flags it copied and advances the head.
    pub fn head_write(&mut self, head: HeadKind, value: i32) {
        self.adjust_head(head);
        let op = if value >= 0 && (value as usize) < self.inst_set.size() {
            value as u8
        } else {
            0
        };
        let pos = self.head_pos(head);
        let _ = self.memory.set(pos, Instruction(op));
        let _ = self.memory.set_flag(pos, SiteFlags::COPIED);
        self.advance_head(head);
    }

    // =========================
    // Allocate and divide
    // =========================

    /// Largest allocation `h-alloc` asks for.
    pub fn max_alloc_size(&self) -> i64 {
        let size = self.memory.len() as f64;
        let by_range = (self.config.child_size_range * size) as i64;
        by_range.min(self.config.max_genome_size as i64 - self.memory.len() as i64)
    }

    /// Grows memory by `requested` sites for an offspring.
    pub fn allocate(
        &mut self,
        ctx: &mut AvidaContext,
        org: &mut dyn OrgInterface,
        requested: i64,
    ) -> bool {
        let cfg = Arc::clone(&self.config);
        if cfg.require_allocate && self.mal_active {
            return self.reject_alloc(org, "allocate already active".to_string());
        }
        if requested < 1 {
            return self.reject_alloc(org, format!("allocate of {} too small", requested));
        }
        let old_size = self.memory.len() as i64;
        let new_size = old_size + requested;
        if new_size > cfg.max_genome_size as i64 || new_size < cfg.min_genome_size as i64 {
            return self.reject_alloc(org, format!("invalid post-allocate size ({})", new_size));
        }
        let max_alloc = (old_size as f64 * cfg.child_size_range) as i64;
        if requested > max_alloc {
            let reason = format!("allocate too large ({} > {})", requested, max_alloc);
            return self.reject_alloc(org, reason);
        }
        let max_old = (requested as f64 * cfg.child_size_range) as i64;
        if old_size > max_old {
            let reason = format!("allocate too small ({} > {})", old_size, max_old);
            return self.reject_alloc(org, reason);
        }

        let (old, new) = (old_size as usize, new_size as usize);
        let grown = match cfg.alloc_method {
            AllocMethod::Default | AllocMethod::Random => self.memory.resize(new),
            AllocMethod::Necro => self.memory.resize_old(new),
        };
        if let Err(err) = grown {
            return self.reject_alloc(org, err.to_string());
        }
        if cfg.alloc_method == AllocMethod::Random {
            for pos in old..new {
                let inst = self.inst_set.random_instruction(ctx.rng());
                let _ = self.memory.set(pos, inst);
            }
        }

        self.mal_active = true;
        self.counters.bump(Counter::Allocations);
        true
    }

    fn reject_alloc(&mut self, org: &mut dyn OrgInterface, reason: String) -> bool {
        self.fault(org, Fault::error(FaultLocation::Alloc, reason));
        false
    }

    /// Checks a proposed split of memory into a parent of `parent_size`
    /// sites followed by a child of `child_size` sites. On success returns
    /// the executed and copied line counts.
    pub fn check_viable(
        &mut self,
        org: &mut dyn OrgInterface,
        parent_size: i64,
        child_size: i64,
    ) -> Option<(usize, usize)> {
        let cfg = Arc::clone(&self.config);
        let genome = self.genome_len as f64;
        let min_size = (cfg.min_genome_size as i64).max((genome / cfg.child_size_range) as i64);
        let max_size = (cfg.max_genome_size as i64).min((genome * cfg.child_size_range) as i64);

        let reason = if child_size < min_size || child_size > max_size {
            Some(format!("invalid offspring length ({})", child_size))
        } else if parent_size < min_size || parent_size > max_size {
            Some(format!("invalid post-divide length ({})", parent_size))
        } else {
            None
        };
        if let Some(reason) = reason {
            self.fault(org, Fault::error(FaultLocation::Divide, reason));
            return None;
        }

        let (parent, child) = (parent_size as usize, child_size as usize);
        let executed = self.memory.executed_count(0..parent);
        let min_exe = (parent as f64 * cfg.min_exe_lines) as usize;
        if executed < min_exe {
            let reason = format!("too few executed lines ({} < {})", executed, min_exe);
            self.fault(org, Fault::error(FaultLocation::Divide, reason));
            return None;
        }
        let copied = self.memory.copied_count(parent..parent + child);
        let min_copied = (child as f64 * cfg.min_copied_lines) as usize;
        if copied < min_copied {
            let reason = format!("too few copied commands ({} < {})", copied, min_copied);
            self.fault(org, Fault::error(FaultLocation::Divide, reason));
            return None;
        }
        Some((executed, copied))
    }

    /// Splits memory at `div_point`; the child is everything after it
    /// except the trailing `extra_lines`.
    ///
    /// On failure a divide fault is reported and nothing else changes.
    pub fn divide(
        &mut self,
        ctx: &mut AvidaContext,
        org: &mut dyn OrgInterface,
        div_point: usize,
        extra_lines: usize,
    ) -> bool {
        let size = self.memory.len() as i64;
        let child_size = size - div_point as i64 - extra_lines as i64;
        let Some((executed, copied)) = self.check_viable(org, div_point as i64, child_size) else {
            self.counters.bump(Counter::FailedDivides);
            return false;
        };

        match self.split_offspring(ctx, div_point, child_size as usize) {
            Ok((genome, mutations)) => {
                let cfg = Arc::clone(&self.config);
                let size_merit = calc_size_merit(
                    cfg.size_merit_method,
                    self.genome_len,
                    copied,
                    executed,
                    cfg.base_const_merit,
                );
                let offspring = Offspring {
                    genome,
                    merit: Merit::new(size_merit * org.bonus()),
                    mutations,
                    copied_size: copied,
                    executed_size: executed,
                    parent_genome_size: self.genome_len,
                };

                self.costs.reset_first_time(&self.inst_set);
                self.mal_active = false;
                if cfg.divide_method == DivideMethod::Split {
                    self.advance_ip = false;
                }
                let parent_alive = org.divide(ctx, offspring);
                if parent_alive {
                    match cfg.divide_method {
                        DivideMethod::Split => self.reset(),
                        DivideMethod::Offspring => self.counters.reset(),
                    }
                }
                true
            }
            Err(err) => {
                self.counters.bump(Counter::FailedDivides);
                self.fault(org, Fault::error(FaultLocation::Divide, err.to_string()));
                false
            }
        }
    }

    /// Crops the child, truncates the parent and applies divide and
    /// germline mutations.
    fn split_offspring(
        &mut self,
        ctx: &mut AvidaContext,
        div_point: usize,
        child_size: usize,
    ) -> Result<(Genome, MutationLog), HardwareError> {
        let cfg = Arc::clone(&self.config);
        let bounds = (cfg.min_genome_size, cfg.max_genome_size);
        let child = self.memory.crop(div_point..div_point + child_size)?;

        let mut log = MutationLog::new();
        let mut child_memory = CpuMemory::from_genome(&child, self.memory.max_size())?;
        let divide_rates = cfg.mutations.divide;
        if !divide_rates.is_zero() {
            apply_mutations(
                ctx,
                &mut child_memory,
                &self.inst_set,
                &divide_rates,
                MutationContext::Divide,
                bounds,
                &mut log,
            )?;
        }
        let child = child_memory.as_genome()?;

        self.memory.resize(div_point)?;
        let germline = cfg.mutations.germline;
        if !germline.is_zero() {
            apply_mutations(
                ctx,
                &mut self.memory,
                &self.inst_set,
                &germline,
                MutationContext::Germline,
                bounds,
                &mut log,
            )?;
        }
        Ok((child, log))
    }
}

/// One hardware tick: thread rotation, cost payment, dispatch and IP
/// advance, repeated once per thread under [`ThreadSlicing::All`].
pub fn run_tick<H: Hardware>(
    hw: &mut H,
    ctx: &mut AvidaContext,
    org: &mut dyn OrgInterface,
    handlers: &[Handler<H>],
) {
    let core = hw.core_mut();
    core.counters.bump(Counter::Cycles);
    let runs = match core.config.thread_slicing {
        ThreadSlicing::One => 1,
        ThreadSlicing::All => core.threads.len(),
    };

    for _ in 0..runs {
        let core = hw.core_mut();
        core.thread_next();
        core.advance_ip = true;
        core.adjust_head(HeadKind::Ip);
        if core.memory.is_empty() {
            return;
        }

        let ip = core.head_pos(HeadKind::Ip);
        let inst = core.inst_at(HeadKind::Ip);
        let set = Arc::clone(&core.inst_set);
        if !core.costs.pay(inst, &set) {
            core.counters.bump(Counter::Deferred);
            continue;
        }
        let Some(handler) = set.lib_index(inst).and_then(|i| handlers.get(i)) else {
            continue;
        };
        let _ = core.memory.set_flag(ip, SiteFlags::EXECUTED);
        core.counters.bump(Counter::Executed);

        handler(hw, ctx, org);

        let core = hw.core_mut();
        if core.advance_ip {
            core.advance_head(HeadKind::Ip);
        }
    }
}
