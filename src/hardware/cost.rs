use crate::hardware::isa::{Instruction, InstructionSet};
use avida_derive::BinaryCodec;

/// Number of counters tracked by [`ExecCounters`].
const COUNTER_COUNT: usize = 10;

/// Per-generation execution statistics kept by the hardware.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash)]
#[repr(u8)]
pub enum Counter {
    /// Ticks spent, including ticks spent paying instruction costs.
    Cycles = 0,
    /// Instructions whose handler actually ran.
    Executed = 1,
    /// Ticks deferred while paying costs.
    Deferred = 2,
    /// Sites copied by `h-copy` / `Head-Copy`.
    Copies = 3,
    /// Copies that mutated.
    CopyMutations = 4,
    Allocations = 5,
    /// Values read by `IO`.
    Inputs = 6,
    FailedDivides = 7,
    Forks = 8,
    Faults = 9,
}

impl Counter {
    pub const fn as_str(&self) -> &'static str {
        match self {
            Counter::Cycles => "Cycles",
            Counter::Executed => "Executed",
            Counter::Deferred => "Deferred",
            Counter::Copies => "Copies",
            Counter::CopyMutations => "Copy Mutations",
            Counter::Allocations => "Allocations",
            Counter::Inputs => "Inputs",
            Counter::FailedDivides => "Failed Divides",
            Counter::Forks => "Forks",
            Counter::Faults => "Faults",
        }
    }

    const ALL: [Counter; COUNTER_COUNT] = [
        Counter::Cycles,
        Counter::Executed,
        Counter::Deferred,
        Counter::Copies,
        Counter::CopyMutations,
        Counter::Allocations,
        Counter::Inputs,
        Counter::FailedDivides,
        Counter::Forks,
        Counter::Faults,
    ];
}

/// Flat array of counters indexed by [`Counter`] discriminant.
#[derive(Clone, Debug, Default, PartialEq, Eq, BinaryCodec)]
pub struct ExecCounters {
    counts: [u64; COUNTER_COUNT],
}

impl ExecCounters {
    pub fn new() -> Self {
        Self::default()
    }

    #[inline(always)]
    pub fn add(&mut self, counter: Counter, amount: u64) {
        let slot = &mut self.counts[counter as usize];
        *slot = slot.saturating_add(amount);
    }

    #[inline(always)]
    pub fn bump(&mut self, counter: Counter) {
        self.add(counter, 1);
    }

    pub fn get(&self, counter: Counter) -> u64 {
        self.counts[counter as usize]
    }

    pub fn reset(&mut self) {
        self.counts = [0; COUNTER_COUNT];
    }

    pub fn iter(&self) -> impl Iterator<Item = (Counter, u64)> {
        Counter::ALL.into_iter().zip(self.counts)
    }
}

/// Remaining cost countdowns for each opcode of an instruction set.
///
/// The first-time cost is paid once per generation; after it, an
/// instruction with per-use cost `c` is deferred `c - 1` times and runs on
/// the `c`-th attempt.
#[derive(Clone, Debug, Default, PartialEq, Eq, BinaryCodec)]
pub struct CostTracker {
    per_use: Vec<u32>,
    first_time: Vec<u32>,
}

impl CostTracker {
    pub fn new(set: &InstructionSet) -> Self {
        let mut tracker = Self::default();
        tracker.reset(set);
        tracker
    }

    pub fn reset(&mut self, set: &InstructionSet) {
        self.per_use = set.iter().map(|(_, e)| e.cost).collect();
        self.first_time = set.iter().map(|(_, e)| e.ft_cost).collect();
    }

    /// Re-arms first-time costs; called when the organism divides.
    pub fn reset_first_time(&mut self, set: &InstructionSet) {
        self.first_time = set.iter().map(|(_, e)| e.ft_cost).collect();
    }

    /// Spends one tick on `inst`. Returns true when the instruction may run now.
    pub fn pay(&mut self, inst: Instruction, set: &InstructionSet) -> bool {
        let op = inst.index();
        if let Some(ft) = self.first_time.get_mut(op) {
            if *ft > 0 {
                *ft -= 1;
                return false;
            }
        }
        let cost = set.cost(inst);
        if cost > 0 {
            if let Some(remaining) = self.per_use.get_mut(op) {
                if *remaining > 1 {
                    *remaining -= 1;
                    return false;
                }
                *remaining = cost;
            }
        }
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hardware::isa::HardwareKind;

    #[test]
    fn counters_accumulate() {
        let mut counters = ExecCounters::new();
        counters.bump(Counter::Executed);
        counters.add(Counter::Cycles, 5);
        counters.add(Counter::Cycles, u64::MAX);
        assert_eq!(counters.get(Counter::Executed), 1);
        assert_eq!(counters.get(Counter::Cycles), u64::MAX);
        assert_eq!(counters.iter().count(), COUNTER_COUNT);
        counters.reset();
        assert_eq!(counters, ExecCounters::new());
    }

    #[test]
    fn per_use_cost_defers() {
        let set = InstructionSet::parse(HardwareKind::Heads, "nop-A 1 3\nnop-B\n").unwrap();
        let mut costs = CostTracker::new(&set);
        let slow = Instruction(0);
        let results: Vec<bool> = (0..6).map(|_| costs.pay(slow, &set)).collect();
        assert_eq!(results, vec![false, false, true, false, false, true]);
        assert!(costs.pay(Instruction(1), &set));
    }

    #[test]
    fn first_time_cost_paid_once_per_generation() {
        let set = InstructionSet::parse(HardwareKind::Heads, "nop-A 1 0 2\n").unwrap();
        let mut costs = CostTracker::new(&set);
        let inst = Instruction(0);
        assert!(!costs.pay(inst, &set));
        assert!(!costs.pay(inst, &set));
        assert!(costs.pay(inst, &set));
        assert!(costs.pay(inst, &set));
        costs.reset_first_time(&set);
        assert!(!costs.pay(inst, &set));
    }
}
