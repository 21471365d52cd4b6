//! The four-stack CPU: no registers, three local stacks and the global
//! stack (index 3), four heads and a four-nop label alphabet.
//!
//! Arithmetic reads the tops of BX and CX without popping them and pushes
//! the result onto `?BX?`.

use crate::config::HardwareConfig;
use crate::hardware::Hardware;
use crate::hardware::base::{Direction, Handler, HardwareCore, ThreadLayout, run_tick};
use crate::hardware::context::AvidaContext;
use crate::hardware::cost::Counter;
use crate::hardware::fault::{Fault, FaultLocation};
use crate::hardware::head::HeadKind;
use crate::hardware::heads_cpu::{divide_at_heads, fork_current_thread, kill_current_thread};
use crate::hardware::interface::OrgInterface;
use crate::hardware::isa::{HardwareKind, InstructionSet};
use crate::{define_library, for_each_stack_instruction};
use std::sync::Arc;

for_each_stack_instruction!(define_library);

macro_rules! define_handlers {
    (
        $lib:ident, $cpu:ident;
        $( $(#[$doc:meta])* $name:ident = $mnemonic:literal, $nop:expr, $handler:ident ),* $(,)?
    ) => {
        pub static HANDLERS: &[Handler<$cpu>] = &[ $( $cpu::$handler, )* ];
    };
}

for_each_stack_instruction!(define_handlers);

/// Every library instruction except the knockout nop, in library order.
pub static DEFAULT_SET: &[StackInst] = &[
    StackInst::NopA,
    StackInst::NopB,
    StackInst::NopC,
    StackInst::NopD,
    StackInst::ValShiftR,
    StackInst::ValShiftL,
    StackInst::ValNand,
    StackInst::ValAdd,
    StackInst::ValSub,
    StackInst::ValMult,
    StackInst::ValDiv,
    StackInst::ValMod,
    StackInst::ValInc,
    StackInst::ValDec,
    StackInst::ValDelete,
    StackInst::ValCopy,
    StackInst::PushNext,
    StackInst::PushPrev,
    StackInst::PushComp,
    StackInst::IfEqual,
    StackInst::IfNotEqual,
    StackInst::IfLess,
    StackInst::IfGreater,
    StackInst::IfLabel,
    StackInst::HeadPush,
    StackInst::HeadPop,
    StackInst::HeadMove,
    StackInst::HeadCopy,
    StackInst::Search,
    StackInst::Alloc,
    StackInst::Divide,
    StackInst::InstRead,
    StackInst::InstWrite,
    StackInst::Io,
    StackInst::ForkThread,
    StackInst::KillThread,
];

const STACK_AX: usize = 0;
const STACK_BX: usize = 1;
const STACK_CX: usize = 2;
/// Local stacks plus the global one.
const NUM_STACKS: usize = 4;

const LAYOUT: ThreadLayout = ThreadLayout {
    registers: 0,
    local_stacks: 3,
};

#[derive(Clone, Debug)]
pub struct StackCpu {
    core: HardwareCore,
}

impl StackCpu {
    pub fn new(inst_set: Arc<InstructionSet>, config: Arc<HardwareConfig>) -> Self {
        Self {
            core: HardwareCore::new(inst_set, config, LAYOUT),
        }
    }

    fn skip_if(&mut self, skip: bool) {
        if skip {
            self.core.advance_head(HeadKind::Ip);
        }
    }

    /// Tops of `?BX?` and the stack after it.
    fn compare_operands(&mut self, org: &mut dyn OrgInterface) -> (i32, i32) {
        let stack = self.core.find_modified_stack(STACK_BX);
        let a = self.core.stack_top(org, stack);
        let b = self.core.stack_top(org, (stack + 1) % NUM_STACKS);
        (a, b)
    }

    fn complement_next_label(&mut self) {
        let kind = self.core.inst_set.kind();
        self.core
            .thread_mut()
            .next_label
            .rotate(kind.complement_shift(), kind.num_nops() as u8);
    }

    fn binary_op(&mut self, org: &mut dyn OrgInterface, op: fn(i32, i32) -> i32) -> bool {
        let dst = self.core.find_modified_stack(STACK_BX);
        let a = self.core.stack_top(org, STACK_BX);
        let b = self.core.stack_top(org, STACK_CX);
        self.core.stack_push(dst, op(a, b));
        true
    }

    fn checked_op(
        &mut self,
        org: &mut dyn OrgInterface,
        op: fn(i32, i32) -> Option<i32>,
        what: &str,
    ) -> bool {
        let dst = self.core.find_modified_stack(STACK_BX);
        let a = self.core.stack_top(org, STACK_BX);
        let b = self.core.stack_top(org, STACK_CX);
        match op(a, b) {
            Some(value) => {
                self.core.stack_push(dst, value);
                true
            }
            None => {
                let reason = format!("{}: divide by zero or overflow", what);
                self.core.fault(org, Fault::error(FaultLocation::Math, reason));
                false
            }
        }
    }

    fn unary_op(&mut self, org: &mut dyn OrgInterface, op: fn(i32) -> i32) -> bool {
        let stack = self.core.find_modified_stack(STACK_BX);
        let value = self.core.stack_pop(org, stack);
        self.core.stack_push(stack, op(value));
        true
    }

    /// Moves the top of `?AX?` onto the stack `offset` places after it.
    fn move_top(&mut self, org: &mut dyn OrgInterface, offset: usize) -> bool {
        let from = self.core.find_modified_stack(STACK_AX);
        let value = self.core.stack_pop(org, from);
        self.core.stack_push((from + offset) % NUM_STACKS, value);
        true
    }

    fn inst_nop(&mut self, _ctx: &mut AvidaContext, _org: &mut dyn OrgInterface) -> bool {
        true
    }

    // =========================
    // Values
    // =========================

    fn inst_val_shift_r(&mut self, _ctx: &mut AvidaContext, org: &mut dyn OrgInterface) -> bool {
        self.unary_op(org, |v| v >> 1)
    }

    fn inst_val_shift_l(&mut self, _ctx: &mut AvidaContext, org: &mut dyn OrgInterface) -> bool {
        self.unary_op(org, |v| v.wrapping_shl(1))
    }

    fn inst_val_nand(&mut self, _ctx: &mut AvidaContext, org: &mut dyn OrgInterface) -> bool {
        self.binary_op(org, |a, b| !(a & b))
    }

    fn inst_val_add(&mut self, _ctx: &mut AvidaContext, org: &mut dyn OrgInterface) -> bool {
        self.binary_op(org, i32::wrapping_add)
    }

    fn inst_val_sub(&mut self, _ctx: &mut AvidaContext, org: &mut dyn OrgInterface) -> bool {
        self.binary_op(org, i32::wrapping_sub)
    }

    fn inst_val_mult(&mut self, _ctx: &mut AvidaContext, org: &mut dyn OrgInterface) -> bool {
        self.binary_op(org, i32::wrapping_mul)
    }

    fn inst_val_div(&mut self, _ctx: &mut AvidaContext, org: &mut dyn OrgInterface) -> bool {
        self.checked_op(org, i32::checked_div, "Val-Div")
    }

    fn inst_val_mod(&mut self, _ctx: &mut AvidaContext, org: &mut dyn OrgInterface) -> bool {
        self.checked_op(org, i32::checked_rem, "Val-Mod")
    }

    fn inst_val_inc(&mut self, _ctx: &mut AvidaContext, org: &mut dyn OrgInterface) -> bool {
        self.unary_op(org, |v| v.wrapping_add(1))
    }

    fn inst_val_dec(&mut self, _ctx: &mut AvidaContext, org: &mut dyn OrgInterface) -> bool {
        self.unary_op(org, |v| v.wrapping_sub(1))
    }

    fn inst_val_delete(&mut self, _ctx: &mut AvidaContext, org: &mut dyn OrgInterface) -> bool {
        let stack = self.core.find_modified_stack(STACK_BX);
        self.core.stack_pop(org, stack);
        true
    }

    fn inst_val_copy(&mut self, _ctx: &mut AvidaContext, org: &mut dyn OrgInterface) -> bool {
        let stack = self.core.find_modified_stack(STACK_BX);
        let value = self.core.stack_top(org, stack);
        self.core.stack_push(stack, value);
        true
    }

    fn inst_push_next(&mut self, _ctx: &mut AvidaContext, org: &mut dyn OrgInterface) -> bool {
        self.move_top(org, 1)
    }

    fn inst_push_prev(&mut self, _ctx: &mut AvidaContext, org: &mut dyn OrgInterface) -> bool {
        self.move_top(org, NUM_STACKS - 1)
    }

    fn inst_push_comp(&mut self, _ctx: &mut AvidaContext, org: &mut dyn OrgInterface) -> bool {
        self.move_top(org, 2)
    }

    // =========================
    // Conditionals
    // =========================

    fn inst_if_equal(&mut self, _ctx: &mut AvidaContext, org: &mut dyn OrgInterface) -> bool {
        let (a, b) = self.compare_operands(org);
        self.skip_if(a != b);
        true
    }

    fn inst_if_not_equal(&mut self, _ctx: &mut AvidaContext, org: &mut dyn OrgInterface) -> bool {
        let (a, b) = self.compare_operands(org);
        self.skip_if(a == b);
        true
    }

    fn inst_if_less(&mut self, _ctx: &mut AvidaContext, org: &mut dyn OrgInterface) -> bool {
        let (a, b) = self.compare_operands(org);
        self.skip_if(a >= b);
        true
    }

    fn inst_if_greater(&mut self, _ctx: &mut AvidaContext, org: &mut dyn OrgInterface) -> bool {
        let (a, b) = self.compare_operands(org);
        self.skip_if(a <= b);
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
    // Heads
    // =========================

    fn inst_head_push(&mut self, _ctx: &mut AvidaContext, _org: &mut dyn OrgInterface) -> bool {
        let head = self.core.find_modified_head(HeadKind::Ip);
        let pos = self.core.head_pos(head);
        self.core.stack_push(STACK_BX, pos as i32);
        true
    }

    fn inst_head_pop(&mut self, _ctx: &mut AvidaContext, org: &mut dyn OrgInterface) -> bool {
        let head = self.core.find_modified_head(HeadKind::Flow);
        let value = self.core.stack_pop(org, STACK_BX);
        self.core.set_head_signed(head, value as i64);
        true
    }

    fn inst_head_move(&mut self, _ctx: &mut AvidaContext, _org: &mut dyn OrgInterface) -> bool {
        let head = self.core.find_modified_head(HeadKind::Ip);
        if head == HeadKind::Flow {
            self.core.advance_head(HeadKind::Flow);
            return true;
        }
        let flow = self.core.head_pos(HeadKind::Flow);
        self.core.set_head(head, flow);
        if head == HeadKind::Ip {
            self.core.advance_ip = false;
        }
        true
    }

    fn inst_head_copy(&mut self, ctx: &mut AvidaContext, _org: &mut dyn OrgInterface) -> bool {
        self.core.head_copy(ctx);
        true
    }

    // =========================
    // Replication
    // =========================

    fn inst_search(&mut self, _ctx: &mut AvidaContext, _org: &mut dyn OrgInterface) -> bool {
        self.core.read_label();
        self.complement_next_label();
        let (found, ok) = self.core.find_label(Direction::Forward);
        let ip = self.core.head_pos(HeadKind::Ip);
        if !ok {
            self.core.set_head(HeadKind::Flow, ip);
            self.core.advance_head(HeadKind::Flow);
            return true;
        }
        let label_len = self.core.thread().next_label.len();
        self.core.stack_push(STACK_BX, found as i32 - ip as i32);
        self.core.stack_push(STACK_AX, label_len as i32);
        self.core.set_head(HeadKind::Flow, found);
        self.core.advance_head(HeadKind::Flow);
        true
    }

    fn inst_alloc(&mut self, ctx: &mut AvidaContext, org: &mut dyn OrgInterface) -> bool {
        let old_size = self.core.memory.len();
        let request = self.core.max_alloc_size();
        if !self.core.allocate(ctx, org, request) {
            return false;
        }
        self.core.stack_push(STACK_AX, old_size as i32);
        true
    }

    fn inst_divide(&mut self, ctx: &mut AvidaContext, org: &mut dyn OrgInterface) -> bool {
        divide_at_heads(&mut self.core, ctx, org)
    }

    fn inst_inst_read(&mut self, ctx: &mut AvidaContext, _org: &mut dyn OrgInterface) -> bool {
        let head = self.core.find_modified_head(HeadKind::Read);
        let inst = self.core.head_read(ctx, head);
        self.core.stack_push(STACK_AX, inst.op() as i32);
        true
    }

    fn inst_inst_write(&mut self, _ctx: &mut AvidaContext, org: &mut dyn OrgInterface) -> bool {
        let head = self.core.find_modified_head(HeadKind::Write);
        let value = self.core.stack_pop(org, STACK_AX);
        self.core.head_write(head, value);
        true
    }

    fn inst_io(&mut self, ctx: &mut AvidaContext, org: &mut dyn OrgInterface) -> bool {
        let stack = self.core.find_modified_stack(STACK_BX);
        let out = self.core.stack_top(org, stack);
        org.output(ctx, out, &self.core.thread().input_buf);
        self.core.thread_mut().output_buf.add(out);

        let input = org.next_input(ctx);
        self.core.stack_push(stack, input);
        self.core.thread_mut().input_buf.add(input);
        self.core.counters.bump(Counter::Inputs);
        true
    }

    // =========================
    // Threads
    // =========================

    fn inst_fork_thread(&mut self, _ctx: &mut AvidaContext, org: &mut dyn OrgInterface) -> bool {
        fork_current_thread(&mut self.core, org)
    }

    fn inst_kill_thread(&mut self, _ctx: &mut AvidaContext, org: &mut dyn OrgInterface) -> bool {
        kill_current_thread(&mut self.core, org)
    }
}

impl Hardware for StackCpu {
    fn kind(&self) -> HardwareKind {
        HardwareKind::FourStack
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
    use crate::hardware::mutation::MutationConfig;

    fn cpu_with(names: &str) -> (StackCpu, AvidaContext, TestInterface) {
        let set = Arc::new(InstructionSet::default_for(HardwareKind::FourStack));
        let listing = names.split_whitespace().collect::<Vec<_>>().join("\n");
        let genome = Genome::from_names(&listing, &set).unwrap();
        let config = HardwareConfig {
            mutations: MutationConfig::none(),
            ..HardwareConfig::default()
        };
        let mut cpu = StackCpu::new(set, Arc::new(config));
        cpu.load_genome(&genome).unwrap();
        (cpu, AvidaContext::new(5), TestInterface::new())
    }

    fn step(cpu: &mut StackCpu, ctx: &mut AvidaContext, org: &mut TestInterface, n: usize) {
        for _ in 0..n {
            cpu.single_process(ctx, org);
        }
    }

    const FILLER: &str = "Val-Inc Val-Inc Val-Inc Val-Inc Val-Inc Val-Inc";

    #[test]
    fn handler_table_matches_library() {
        assert_eq!(HANDLERS.len(), LIBRARY.len());
        assert_eq!(DEFAULT_SET.len() + 1, StackInst::ALL.len());
        assert!(!DEFAULT_SET.contains(&StackInst::NopX));
    }

    #[test]
    fn add_pushes_sum_without_popping_operands() {
        let (mut cpu, mut ctx, mut org) = cpu_with(&format!("Val-Add {}", FILLER));
        cpu.core_mut().stack_push(STACK_BX, 3);
        cpu.core_mut().stack_push(STACK_CX, 4);
        step(&mut cpu, &mut ctx, &mut org, 1);
        let core = cpu.core();
        assert_eq!(core.stack(STACK_BX).values(), &[3, 7]);
        assert_eq!(core.stack(STACK_CX).values(), &[4]);
        assert!(org.faults.is_empty());
    }

    #[test]
    fn push_comp_moves_to_opposite_stack() {
        let (mut cpu, mut ctx, mut org) = cpu_with(&format!("Push-Comp Nop-B {}", FILLER));
        cpu.core_mut().stack_push(STACK_BX, 9);
        step(&mut cpu, &mut ctx, &mut org, 1);
        let core = cpu.core();
        assert!(core.stack(STACK_BX).is_empty());
        assert_eq!(core.stack(3).top(), Some(9));
        assert_eq!(core.global_stack.top(), Some(9));
    }

    #[test]
    fn val_div_by_zero_faults() {
        let (mut cpu, mut ctx, mut org) = cpu_with(&format!("Val-Div {}", FILLER));
        cpu.core_mut().stack_push(STACK_BX, 10);
        cpu.core_mut().stack_push(STACK_CX, 0);
        step(&mut cpu, &mut ctx, &mut org, 1);
        assert_eq!(org.faults.len(), 1);
        assert_eq!(org.faults[0].location, FaultLocation::Math);
        assert_eq!(cpu.core().stack(STACK_BX).values(), &[10]);
    }

    #[test]
    fn search_without_label_puts_flow_after_ip() {
        let (mut cpu, mut ctx, mut org) = cpu_with(&format!("Search {}", FILLER));
        step(&mut cpu, &mut ctx, &mut org, 1);
        assert_eq!(cpu.core().head_pos(HeadKind::Flow), 1);
        assert!(cpu.core().stack(STACK_BX).is_empty());
    }

    #[test]
    fn if_label_uses_four_nop_complement() {
        // Copy Nop-C, then If-Label Nop-A: the complement of A is C, so the
        // following Val-Inc runs.
        let (mut cpu, mut ctx, mut org) =
            cpu_with(&format!("Head-Copy If-Label Nop-A Val-Inc {}", FILLER));
        let set = Arc::clone(&cpu.core().inst_set);
        let nop_c = set.from_name("Nop-C").unwrap();
        cpu.core_mut().memory.set(7, nop_c).unwrap();
        cpu.core_mut().set_head(HeadKind::Read, 7);
        cpu.core_mut().set_head(HeadKind::Write, 8);
        step(&mut cpu, &mut ctx, &mut org, 2);
        assert_eq!(cpu.core().head_pos(HeadKind::Ip), 3);
    }
}
