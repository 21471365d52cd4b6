//! Mutation operators applied at divide.
//!
//! Copy mutations happen inside `h-copy` itself; everything here runs once
//! per successful divide, on the offspring (divide context) and on the
//! parent's retained memory (germline context).

use crate::hardware::context::AvidaContext;
use crate::hardware::errors::HardwareError;
use crate::hardware::isa::{Instruction, InstructionSet};
use crate::hardware::memory::{CpuMemory, SiteFlags};

#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct MutationRates {
    /// Per-site substitution probability.
    pub point_sub: f64,
    /// Probability of exactly one substitution.
    pub single_sub: f64,
    /// Probability of one insertion.
    pub insertion: f64,
    /// Probability of one deletion.
    pub deletion: f64,
}

impl MutationRates {
    pub const NONE: MutationRates = MutationRates {
        point_sub: 0.0,
        single_sub: 0.0,
        insertion: 0.0,
        deletion: 0.0,
    };

    pub fn is_zero(&self) -> bool {
        *self == Self::NONE
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum MutationContext {
    Copy,
    Divide,
    Germline,
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct MutationConfig {
    pub copy_mut_prob: f64,
    pub divide: MutationRates,
    pub germline: MutationRates,
}

impl Default for MutationConfig {
    fn default() -> Self {
        Self {
            copy_mut_prob: 0.0075,
            divide: MutationRates {
                point_sub: 0.0,
                single_sub: 0.0,
                insertion: 0.05,
                deletion: 0.05,
            },
            germline: MutationRates::NONE,
        }
    }
}

impl MutationConfig {
    pub fn none() -> Self {
        Self {
            copy_mut_prob: 0.0,
            divide: MutationRates::NONE,
            germline: MutationRates::NONE,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum MutationKind {
    Substitution,
    Insertion,
    Deletion,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Mutation {
    pub kind: MutationKind,
    pub context: MutationContext,
    pub site: usize,
    pub from: Option<Instruction>,
    pub to: Option<Instruction>,
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct MutationLog {
    events: Vec<Mutation>,
}

impl MutationLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, mutation: Mutation) {
        self.events.push(mutation);
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    pub fn events(&self) -> &[Mutation] {
        &self.events
    }

    pub fn count(&self, kind: MutationKind) -> usize {
        self.events.iter().filter(|m| m.kind == kind).count()
    }

    pub fn clear(&mut self) {
        self.events.clear();
    }
}

fn substitute(
    ctx: &mut AvidaContext,
    memory: &mut CpuMemory,
    set: &InstructionSet,
    pos: usize,
    context: MutationContext,
    log: &mut MutationLog,
) -> Result<(), HardwareError> {
    let from = memory.get(pos)?;
    let to = set.random_instruction(ctx.rng());
    memory.set(pos, to)?;
    memory.set_flag(pos, SiteFlags::MUTATED)?;
    memory.set_flag(pos, SiteFlags::POINT_MUT)?;
    log.push(Mutation {
        kind: MutationKind::Substitution,
        context,
        site: pos,
        from: Some(from),
        to: Some(to),
    });
    Ok(())
}

/// Applies one round of `rates` to `memory`, in the order single
/// substitution, insertion, deletion, per-site substitution. Insertions stop
/// at `max_size` and deletions at `min_size`.
pub fn apply_mutations(
    ctx: &mut AvidaContext,
    memory: &mut CpuMemory,
    set: &InstructionSet,
    rates: &MutationRates,
    context: MutationContext,
    (min_size, max_size): (usize, usize),
    log: &mut MutationLog,
) -> Result<(), HardwareError> {
    if memory.is_empty() {
        return Ok(());
    }

    if ctx.chance(rates.single_sub) {
        let pos = ctx.random_index(memory.len());
        substitute(ctx, memory, set, pos, context, log)?;
    }

    if ctx.chance(rates.insertion) && memory.len() < max_size {
        let pos = ctx.random_index(memory.len() + 1);
        let inst = set.random_instruction(ctx.rng());
        memory.insert(pos, inst)?;
        memory.set_flag(pos, SiteFlags::MUTATED)?;
        log.push(Mutation {
            kind: MutationKind::Insertion,
            context,
            site: pos,
            from: None,
            to: Some(inst),
        });
    }

    if ctx.chance(rates.deletion) && memory.len() > min_size {
        let pos = ctx.random_index(memory.len());
        let from = memory.get(pos)?;
        memory.remove(pos, 1)?;
        log.push(Mutation {
            kind: MutationKind::Deletion,
            context,
            site: pos,
            from: Some(from),
            to: None,
        });
    }

    if rates.point_sub > 0.0 {
        for pos in 0..memory.len() {
            if ctx.chance(rates.point_sub) {
                substitute(ctx, memory, set, pos, context, log)?;
            }
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hardware::isa::HardwareKind;

    fn setup(len: usize) -> (InstructionSet, CpuMemory) {
        let set = InstructionSet::default_for(HardwareKind::Heads);
        let text = "c".repeat(len);
        let memory = CpuMemory::from_symbols(&text, &set, 4 * len).unwrap();
        (set, memory)
    }

    #[test]
    fn zero_rates_change_nothing() {
        let (set, mut memory) = setup(50);
        let before = memory.clone();
        let mut ctx = AvidaContext::new(1);
        let mut log = MutationLog::new();
        apply_mutations(
            &mut ctx,
            &mut memory,
            &set,
            &MutationRates::NONE,
            MutationContext::Divide,
            (8, 2048),
            &mut log,
        )
        .unwrap();
        assert_eq!(memory, before);
        assert!(log.is_empty());
    }

    #[test]
    fn certain_insertion_and_deletion_respect_bounds() {
        let (set, mut memory) = setup(10);
        let mut ctx = AvidaContext::new(2);
        let mut log = MutationLog::new();
        let rates = MutationRates {
            insertion: 1.0,
            ..MutationRates::NONE
        };
        apply_mutations(&mut ctx, &mut memory, &set, &rates, MutationContext::Divide, (8, 10), &mut log)
            .unwrap();
        assert_eq!(memory.len(), 10);

        let rates = MutationRates {
            deletion: 1.0,
            ..MutationRates::NONE
        };
        apply_mutations(&mut ctx, &mut memory, &set, &rates, MutationContext::Divide, (8, 20), &mut log)
            .unwrap();
        assert_eq!(memory.len(), 9);
        assert_eq!(log.count(MutationKind::Deletion), 1);
        assert_eq!(log.count(MutationKind::Insertion), 0);
    }

    #[test]
    fn single_substitution_logs_one_event() {
        let (set, mut memory) = setup(20);
        let mut ctx = AvidaContext::new(3);
        let mut log = MutationLog::new();
        let rates = MutationRates {
            single_sub: 1.0,
            ..MutationRates::NONE
        };
        apply_mutations(&mut ctx, &mut memory, &set, &rates, MutationContext::Germline, (8, 2048), &mut log)
            .unwrap();
        assert_eq!(log.len(), 1);
        let event = log.events()[0];
        assert_eq!(event.context, MutationContext::Germline);
        assert!(memory.has_flag(event.site, SiteFlags::MUTATED));
    }

    #[test]
    fn point_substitution_rate_matches_probability() {
        // 100 sites x 1000 rounds = 100,000 trials at p = 0.01.
        // Mean 1000, sd ~31.5; accept +/- 5 sd.
        let (set, template) = setup(100);
        let mut ctx = AvidaContext::new(2024);
        let rates = MutationRates {
            point_sub: 0.01,
            ..MutationRates::NONE
        };
        let mut events = 0;
        for _ in 0..1000 {
            let mut memory = template.clone();
            let mut log = MutationLog::new();
            apply_mutations(&mut ctx, &mut memory, &set, &rates, MutationContext::Divide, (8, 2048), &mut log)
                .unwrap();
            events += log.count(MutationKind::Substitution);
        }
        assert!((843..=1157).contains(&events), "observed {} events", events);
    }
}
