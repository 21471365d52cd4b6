//! The heads CPU: three registers, four heads, one local stack plus the
//! shared global stack.
//!
//! Most instructions take an optional nop modifier from the instruction
//! that follows them. In the docs `?BX?` means "BX unless modified".

use crate::config::HardwareConfig;
use crate::hardware::Hardware;
use crate::hardware::base::{Direction, Handler, HardwareCore, ThreadLayout, run_tick};
use crate::hardware::context::AvidaContext;
use crate::hardware::cost::Counter;
use crate::hardware::fault::{Fault, FaultLocation};
use crate::hardware::head::HeadKind;
use crate::hardware::interface::OrgInterface;
use crate::hardware::isa::{HardwareKind, InstructionSet};
use crate::{define_library, for_each_heads_instruction};
use std::sync::Arc;

for_each_heads_instruction!(define_library);

macro_rules! define_handlers {
    (
        $lib:ident, $cpu:ident;
        $( $(#[$doc:meta])* $name:ident = $mnemonic:literal, $nop:expr, $handler:ident ),* $(,)?
    ) => {
        /// Handler table indexed like [`LIBRARY`].
        pub static HANDLERS: &[Handler<$cpu>] = &[ $( $cpu::$handler, )* ];
    };
}

for_each_heads_instruction!(define_handlers);

/// The classic 26-instruction set, `a` through `z`.
pub static DEFAULT_SET: &[HeadsInst] = &[
    HeadsInst::NopA,
    HeadsInst::NopB,
    HeadsInst::NopC,
    HeadsInst::IfNEqu,
    HeadsInst::IfLess,
    HeadsInst::Pop,
    HeadsInst::Push,
    HeadsInst::SwapStk,
    HeadsInst::Swap,
    HeadsInst::ShiftR,
    HeadsInst::ShiftL,
    HeadsInst::Inc,
    HeadsInst::Dec,
    HeadsInst::Add,
    HeadsInst::Sub,
    HeadsInst::Nand,
    HeadsInst::Io,
    HeadsInst::HAlloc,
    HeadsInst::HDivide,
    HeadsInst::HCopy,
    HeadsInst::HSearch,
    HeadsInst::MovHead,
    HeadsInst::JmpHead,
    HeadsInst::GetHead,
    HeadsInst::IfLabel,
    HeadsInst::SetFlow,
];

const REG_AX: usize = 0;
const REG_BX: usize = 1;
const REG_CX: usize = 2;

const LAYOUT: ThreadLayout = ThreadLayout {
    registers: 3,
    local_stacks: 1,
};

#[derive(Clone, Debug)]
pub struct HeadsCpu {
    core: HardwareCore,
}

impl HeadsCpu {
    pub fn new(inst_set: Arc<InstructionSet>, config: Arc<HardwareConfig>) -> Self {
        Self {
            core: HardwareCore::new(inst_set, config, LAYOUT),
        }
    }

    #[inline]
    fn reg(&self, reg: usize) -> i32 {
        self.core.thread().registers[reg]
    }

    #[inline]
    fn set_reg(&mut self, reg: usize, value: i32) {
        self.core.thread_mut().registers[reg] = value;
    }

    fn skip_if(&mut self, skip: bool) {
        if skip {
            self.core.advance_head(HeadKind::Ip);
        }
    }

    /// Operand pair for the comparison instructions.
    fn compare_operands(&mut self) -> (i32, i32) {
        let op1 = self.core.find_modified_register(REG_BX);
        let op2 = self.core.next_register(op1);
        (self.reg(op1), self.reg(op2))
    }

    fn complement_next_label(&mut self) {
        let kind = self.core.inst_set.kind();
        self.core
            .thread_mut()
            .next_label
            .rotate(kind.complement_shift(), kind.num_nops() as u8);
    }

    fn binary_op(&mut self, op: fn(i32, i32) -> i32) -> bool {
        let dst = self.core.find_modified_register(REG_BX);
        let value = op(self.reg(REG_BX), self.reg(REG_CX));
        self.set_reg(dst, value);
        true
    }

    fn checked_op(
        &mut self,
        org: &mut dyn OrgInterface,
        op: fn(i32, i32) -> Option<i32>,
        what: &str,
    ) -> bool {
        let dst = self.core.find_modified_register(REG_BX);
        match op(self.reg(REG_BX), self.reg(REG_CX)) {
            Some(value) => {
                self.set_reg(dst, value);
                true
            }
            None => {
                let reason = format!("{}: divide by zero or overflow", what);
                self.core.fault(org, Fault::error(FaultLocation::Math, reason));
                false
            }
        }
    }

    // =========================
    // Nops and conditionals
    // =========================

    fn inst_nop(&mut self, _ctx: &mut AvidaContext, _org: &mut dyn OrgInterface) -> bool {
        true
    }

    fn inst_if_n_equ(&mut self, _ctx: &mut AvidaContext, _org: &mut dyn OrgInterface) -> bool {
        let (a, b) = self.compare_operands();
        self.skip_if(a == b);
        true
    }

    fn inst_if_equ(&mut self, _ctx: &mut AvidaContext, _org: &mut dyn OrgInterface) -> bool {
        let (a, b) = self.compare_operands();
        self.skip_if(a != b);
        true
    }

    fn inst_if_less(&mut self, _ctx: &mut AvidaContext, _org: &mut dyn OrgInterface) -> bool {
        let (a, b) = self.compare_operands();
        self.skip_if(a >= b);
        true
    }

    fn inst_if_grt(&mut self, _ctx: &mut AvidaContext, _org: &mut dyn OrgInterface) -> bool {
        let (a, b) = self.compare_operands();
        self.skip_if(a <= b);
        true
    }

    fn inst_if_bit_1(&mut self, _ctx: &mut AvidaContext, _org: &mut dyn OrgInterface) -> bool {
        let reg = self.core.find_modified_register(REG_BX);
        let value = self.reg(reg);
        self.skip_if(value & 1 == 0);
        true
    }

    fn inst_if_label(&mut self, _ctx: &mut AvidaContext, _org: &mut dyn OrgInterface) -> bool {
        self.core.read_label();
        self.complement_next_label();
        let thread = self.core.thread();
        let matched = thread.next_label == thread.read_label;
        self.skip_if(!matched);
        true
    }

    // =========================
    // Stacks
    // =========================

    fn inst_pop(&mut self, _ctx: &mut AvidaContext, org: &mut dyn OrgInterface) -> bool {
        let reg = self.core.find_modified_register(REG_BX);
        let stack = self.core.thread().cur_stack;
        let value = self.core.stack_pop(org, stack);
        self.set_reg(reg, value);
        true
    }

    fn inst_push(&mut self, _ctx: &mut AvidaContext, _org: &mut dyn OrgInterface) -> bool {
        let reg = self.core.find_modified_register(REG_BX);
        let stack = self.core.thread().cur_stack;
        let value = self.reg(reg);
        self.core.stack_push(stack, value);
        true
    }

    fn inst_swap_stk(&mut self, _ctx: &mut AvidaContext, _org: &mut dyn OrgInterface) -> bool {
        let thread = self.core.thread_mut();
        thread.cur_stack = (thread.cur_stack + 1) % (LAYOUT.local_stacks + 1);
        true
    }

    // =========================
    // Registers
    // =========================

    fn inst_swap(&mut self, _ctx: &mut AvidaContext, _org: &mut dyn OrgInterface) -> bool {
        let op1 = self.core.find_modified_register(REG_AX);
        let op2 = self.core.next_register(op1);
        self.core.thread_mut().registers.swap(op1, op2);
        true
    }

    fn inst_shift_r(&mut self, _ctx: &mut AvidaContext, _org: &mut dyn OrgInterface) -> bool {
        let reg = self.core.find_modified_register(REG_BX);
        let value = self.reg(reg) >> 1;
        self.set_reg(reg, value);
        true
    }

    fn inst_shift_l(&mut self, _ctx: &mut AvidaContext, _org: &mut dyn OrgInterface) -> bool {
        let reg = self.core.find_modified_register(REG_BX);
        let value = self.reg(reg).wrapping_shl(1);
        self.set_reg(reg, value);
        true
    }

    fn inst_inc(&mut self, _ctx: &mut AvidaContext, _org: &mut dyn OrgInterface) -> bool {
        let reg = self.core.find_modified_register(REG_BX);
        let value = self.reg(reg).wrapping_add(1);
        self.set_reg(reg, value);
        true
    }

    fn inst_dec(&mut self, _ctx: &mut AvidaContext, _org: &mut dyn OrgInterface) -> bool {
        let reg = self.core.find_modified_register(REG_BX);
        let value = self.reg(reg).wrapping_sub(1);
        self.set_reg(reg, value);
        true
    }

    fn inst_zero(&mut self, _ctx: &mut AvidaContext, _org: &mut dyn OrgInterface) -> bool {
        let reg = self.core.find_modified_register(REG_BX);
        self.set_reg(reg, 0);
        true
    }

    fn inst_add(&mut self, _ctx: &mut AvidaContext, _org: &mut dyn OrgInterface) -> bool {
        self.binary_op(i32::wrapping_add)
    }

    fn inst_sub(&mut self, _ctx: &mut AvidaContext, _org: &mut dyn OrgInterface) -> bool {
        self.binary_op(i32::wrapping_sub)
    }

    fn inst_mult(&mut self, _ctx: &mut AvidaContext, _org: &mut dyn OrgInterface) -> bool {
        self.binary_op(i32::wrapping_mul)
    }

    fn inst_nand(&mut self, _ctx: &mut AvidaContext, _org: &mut dyn OrgInterface) -> bool {
        self.binary_op(|a, b| !(a & b))
    }

    fn inst_div(&mut self, _ctx: &mut AvidaContext, org: &mut dyn OrgInterface) -> bool {
        self.checked_op(org, i32::checked_div, "div")
    }

    fn inst_mod(&mut self, _ctx: &mut AvidaContext, org: &mut dyn OrgInterface) -> bool {
        self.checked_op(org, i32::checked_rem, "mod")
    }

    fn inst_io(&mut self, ctx: &mut AvidaContext, org: &mut dyn OrgInterface) -> bool {
        let reg = self.core.find_modified_register(REG_BX);
        let out = self.reg(reg);
        org.output(ctx, out, &self.core.thread().input_buf);
        self.core.thread_mut().output_buf.add(out);

        let input = org.next_input(ctx);
        self.set_reg(reg, input);
        self.core.thread_mut().input_buf.add(input);
        self.core.counters.bump(Counter::Inputs);
        true
    }

    // =========================
    // Replication
    // =========================

    fn inst_h_alloc(&mut self, ctx: &mut AvidaContext, org: &mut dyn OrgInterface) -> bool {
        let old_size = self.core.memory.len();
        let request = self.core.max_alloc_size();
        if !self.core.allocate(ctx, org, request) {
            return false;
        }
        self.set_reg(REG_AX, old_size as i32);
        true
    }

    fn inst_h_divide(&mut self, ctx: &mut AvidaContext, org: &mut dyn OrgInterface) -> bool {
        divide_at_heads(&mut self.core, ctx, org)
    }

    fn inst_h_copy(&mut self, ctx: &mut AvidaContext, _org: &mut dyn OrgInterface) -> bool {
        self.core.head_copy(ctx);
        true
    }

    fn inst_h_search(&mut self, _ctx: &mut AvidaContext, _org: &mut dyn OrgInterface) -> bool {
        self.core.read_label();
        self.complement_next_label();
        let (found, _) = self.core.find_label(Direction::Forward);
        let ip = self.core.head_pos(HeadKind::Ip);
        let label_len = self.core.thread().next_label.len();
        self.set_reg(REG_BX, found as i32 - ip as i32);
        self.set_reg(REG_CX, label_len as i32);
        self.core.set_head(HeadKind::Flow, found);
        self.core.advance_head(HeadKind::Flow);
        true
    }

    fn inst_h_read(&mut self, ctx: &mut AvidaContext, _org: &mut dyn OrgInterface) -> bool {
        let head = self.core.find_modified_head(HeadKind::Read);
        let inst = self.core.head_read(ctx, head);
        self.set_reg(REG_BX, inst.op() as i32);
        true
    }

    fn inst_h_write(&mut self, _ctx: &mut AvidaContext, _org: &mut dyn OrgInterface) -> bool {
        let head = self.core.find_modified_head(HeadKind::Write);
        let value = self.reg(REG_BX);
        self.core.head_write(head, value);
        true
    }

    // =========================
    // Heads
    // =========================

    fn inst_h_push(&mut self, _ctx: &mut AvidaContext, _org: &mut dyn OrgInterface) -> bool {
        let head = self.core.find_modified_head(HeadKind::Ip);
        let stack = self.core.thread().cur_stack;
        let pos = self.core.head_pos(head);
        self.core.stack_push(stack, pos as i32);
        true
    }

    fn inst_h_pop(&mut self, _ctx: &mut AvidaContext, org: &mut dyn OrgInterface) -> bool {
        let head = self.core.find_modified_head(HeadKind::Ip);
        let stack = self.core.thread().cur_stack;
        let value = self.core.stack_pop(org, stack);
        self.core.set_head_signed(head, value as i64);
        true
    }

    fn inst_mov_head(&mut self, _ctx: &mut AvidaContext, _org: &mut dyn OrgInterface) -> bool {
        let head = self.core.find_modified_head(HeadKind::Ip);
        let flow = self.core.head_pos(HeadKind::Flow);
        self.core.set_head(head, flow);
        if head == HeadKind::Ip {
            self.core.advance_ip = false;
        }
        true
    }

    fn inst_jmp_head(&mut self, _ctx: &mut AvidaContext, _org: &mut dyn OrgInterface) -> bool {
        let head = self.core.find_modified_head(HeadKind::Ip);
        let offset = self.reg(REG_CX);
        self.core.jump_head(head, offset as i64);
        true
    }

    fn inst_get_head(&mut self, _ctx: &mut AvidaContext, _org: &mut dyn OrgInterface) -> bool {
        let head = self.core.find_modified_head(HeadKind::Ip);
        let pos = self.core.head_pos(head);
        self.set_reg(REG_CX, pos as i32);
        true
    }

    fn inst_set_head(&mut self, _ctx: &mut AvidaContext, _org: &mut dyn OrgInterface) -> bool {
        let head = self.core.find_modified_head(HeadKind::Ip);
        self.core.thread_mut().cur_head = head as usize;
        true
    }

    fn inst_adv_head(&mut self, _ctx: &mut AvidaContext, _org: &mut dyn OrgInterface) -> bool {
        let head = self.core.find_modified_head(HeadKind::Write);
        self.core.advance_head(head);
        true
    }

    fn inst_set_flow(&mut self, _ctx: &mut AvidaContext, _org: &mut dyn OrgInterface) -> bool {
        let reg = self.core.find_modified_register(REG_CX);
        let target = self.reg(reg);
        self.core.set_head_signed(HeadKind::Flow, target as i64);
        true
    }

    // =========================
    // Threads
    // =========================

    fn inst_fork_th(&mut self, _ctx: &mut AvidaContext, org: &mut dyn OrgInterface) -> bool {
        fork_current_thread(&mut self.core, org)
    }

    fn inst_kill_th(&mut self, _ctx: &mut AvidaContext, org: &mut dyn OrgInterface) -> bool {
        kill_current_thread(&mut self.core, org)
    }

    fn inst_id_th(&mut self, _ctx: &mut AvidaContext, _org: &mut dyn OrgInterface) -> bool {
        let reg = self.core.find_modified_register(REG_BX);
        let id = self.core.cur_thread_id();
        self.set_reg(reg, id as i32);
        true
    }
}

/// Divide at READ with the child ending at WRITE (WRITE at 0 means the end
/// of memory). Shared with the four-stack CPU.
pub(crate) fn divide_at_heads(
    core: &mut HardwareCore,
    ctx: &mut AvidaContext,
    org: &mut dyn OrgInterface,
) -> bool {
    core.adjust_heads();
    let len = core.memory.len();
    let div_point = core.head_pos(HeadKind::Read);
    let child_end = match core.head_pos(HeadKind::Write) {
        0 => len,
        pos => pos,
    };
    let divided = core.divide(ctx, org, div_point, len - child_end);
    core.adjust_heads();
    divided
}

/// The new thread starts one instruction past the forking one.
pub(crate) fn fork_current_thread(core: &mut HardwareCore, org: &mut dyn OrgInterface) -> bool {
    core.advance_head(HeadKind::Ip);
    if !core.fork_thread() {
        core.fault(org, Fault::error(FaultLocation::ThreadFork, "thread limit reached"));
        return false;
    }
    true
}

pub(crate) fn kill_current_thread(core: &mut HardwareCore, org: &mut dyn OrgInterface) -> bool {
    if !core.kill_thread() {
        core.fault(org, Fault::error(FaultLocation::ThreadKill, "cannot kill the last thread"));
        return false;
    }
    core.advance_ip = false;
    true
}

impl Hardware for HeadsCpu {
    fn kind(&self) -> HardwareKind {
        HardwareKind::Heads
    }

    fn core(&self) -> &HardwareCore {
        &self.core
    }

    fn core_mut(&mut self) -> &mut HardwareCore {
        &mut self.core
    }

    fn single_process(&mut self, ctx: &mut AvidaContext, org: &mut dyn OrgInterface) {
        run_tick(self, ctx, org, HANDLERS);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hardware::genome::Genome;
    use crate::hardware::interface::tests::TestInterface;

    fn cpu_with(symbols: &str) -> (HeadsCpu, AvidaContext, TestInterface) {
        let set = Arc::new(InstructionSet::default_for(HardwareKind::Heads));
        let genome = Genome::from_symbols(symbols, &set).unwrap();
        let mut cpu = HeadsCpu::new(set, Arc::new(HardwareConfig::default()));
        cpu.load_genome(&genome).unwrap();
        (cpu, AvidaContext::new(11), TestInterface::new())
    }

    fn step(cpu: &mut HeadsCpu, ctx: &mut AvidaContext, org: &mut TestInterface, n: usize) {
        for _ in 0..n {
            cpu.single_process(ctx, org);
        }
    }

    #[test]
    fn handler_table_matches_library() {
        assert_eq!(HANDLERS.len(), LIBRARY.len());
        assert_eq!(HeadsInst::ALL.len(), LIBRARY.len());
        for inst in DEFAULT_SET {
            assert!(inst.nop_mod().is_some() == inst.name().starts_with("nop-"));
        }
    }

    #[test]
    fn inc_then_push_pop_moves_values_between_registers() {
        // inc BX; inc BX; push BX; pop ?CX?
        let (mut cpu, mut ctx, mut org) = cpu_with("llgfcaaaaaaa");
        step(&mut cpu, &mut ctx, &mut org, 4);
        let regs = &cpu.core().thread().registers;
        assert_eq!(regs[REG_BX], 2);
        assert_eq!(regs[REG_CX], 2);
        assert_eq!(cpu.core().head_pos(HeadKind::Ip), 5);
    }

    #[test]
    fn if_n_equ_skips_when_equal() {
        // Registers start equal, so the inc after if-n-equ is skipped.
        let (mut cpu, mut ctx, mut org) = cpu_with("dlaaaaaa");
        step(&mut cpu, &mut ctx, &mut org, 1);
        assert_eq!(cpu.core().head_pos(HeadKind::Ip), 2);
        assert_eq!(cpu.core().thread().registers[REG_BX], 0);
    }

    #[test]
    fn nand_combines_bx_and_cx() {
        let (mut cpu, mut ctx, mut org) = cpu_with("plllllll");
        cpu.core_mut().thread_mut().registers = vec![0, 0b1100, 0b1010];
        step(&mut cpu, &mut ctx, &mut org, 1);
        assert_eq!(cpu.core().thread().registers[REG_BX], !0b1000);
    }

    #[test]
    fn io_outputs_then_reads_input() {
        let (mut cpu, mut ctx, mut org) = cpu_with("qlllllll");
        cpu.core_mut().thread_mut().registers[REG_BX] = 42;
        step(&mut cpu, &mut ctx, &mut org, 1);
        assert_eq!(org.outputs, vec![42]);
        assert_eq!(cpu.core().thread().registers[REG_BX], 0x0f13149f);
        assert_eq!(cpu.core().thread().input_buf.get(0), Some(0x0f13149f));
        assert_eq!(cpu.counters().get(Counter::Inputs), 1);
    }

    #[test]
    fn empty_pop_yields_zero_and_warns() {
        let (mut cpu, mut ctx, mut org) = cpu_with("fcaaaaaa");
        cpu.core_mut().thread_mut().registers[REG_CX] = 9;
        step(&mut cpu, &mut ctx, &mut org, 1);
        assert_eq!(cpu.core().thread().registers[REG_CX], 0);
        assert_eq!(org.faults.len(), 1);
        assert_eq!(org.faults[0].location, FaultLocation::Stack);
    }

    #[test]
    fn mov_head_jumps_ip_to_flow() {
        // h-search with no label puts FLOW one past the IP; mov-head then
        // lands on it without the usual advance.
        let (mut cpu, mut ctx, mut org) = cpu_with("uvlllaaa");
        step(&mut cpu, &mut ctx, &mut org, 2);
        assert_eq!(cpu.core().head_pos(HeadKind::Flow), 1);
        assert_eq!(cpu.core().head_pos(HeadKind::Ip), 1);
    }

    #[test]
    fn search_finds_complement_label() {
        // h-search nop-A nop-B ... nop-B nop-C: complement of AB is BC.
        let (mut cpu, mut ctx, mut org) = cpu_with("uabllllbcl");
        step(&mut cpu, &mut ctx, &mut org, 1);
        let core = cpu.core();
        assert_eq!(core.head_pos(HeadKind::Flow), 9);
        assert_eq!(core.thread().registers[REG_BX], 6);
        assert_eq!(core.thread().registers[REG_CX], 2);
    }
}
