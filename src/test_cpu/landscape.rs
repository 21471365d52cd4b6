//! Knockout sweeps: how much each site (or pair of sites) matters.
//!
//! Every mutant runs on its own test CPU with a random stream derived from
//! the caller's seed and the mutant's index, so results are the same however
//! rayon spreads the work.

use crate::hardware::context::AvidaContext;
use crate::hardware::errors::HardwareError;
use crate::hardware::genome::Genome;
use crate::hardware::isa::Instruction;
use crate::test_cpu::{CpuTestInfo, TestCpu};
use rayon::prelude::*;

/// Relative fitness change treated as no change.
const NEUTRAL_TOLERANCE: f64 = 1e-9;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum KnockoutClass {
    /// The mutant no longer divides.
    Lethal,
    Detrimental,
    Neutral,
    Beneficial,
}

impl KnockoutClass {
    pub fn classify(base_fitness: f64, fitness: f64) -> Self {
        if fitness <= 0.0 {
            KnockoutClass::Lethal
        } else if fitness < base_fitness * (1.0 - NEUTRAL_TOLERANCE) {
            KnockoutClass::Detrimental
        } else if fitness > base_fitness * (1.0 + NEUTRAL_TOLERANCE) {
            KnockoutClass::Beneficial
        } else {
            KnockoutClass::Neutral
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct Knockout {
    pub sites: Vec<usize>,
    pub fitness: f64,
    pub class: KnockoutClass,
}

#[derive(Clone, Debug, PartialEq)]
pub struct Landscape {
    pub base_fitness: f64,
    pub knockouts: Vec<Knockout>,
}

impl Landscape {
    pub fn count(&self, class: KnockoutClass) -> usize {
        self.knockouts.iter().filter(|k| k.class == class).count()
    }

    /// Fraction of knockouts in `class`; 0 for an empty sweep.
    pub fn fraction(&self, class: KnockoutClass) -> f64 {
        if self.knockouts.is_empty() {
            return 0.0;
        }
        self.count(class) as f64 / self.knockouts.len() as f64
    }
}

fn knockout_instruction(cpu: &TestCpu) -> Instruction {
    let set = cpu.inst_set();
    set.knockout_instruction()
        .unwrap_or_else(|| set.default_instruction())
}

fn knock_out(genome: &Genome, sites: &[usize], inst: Instruction) -> Result<Genome, HardwareError> {
    let mut mutant = genome.clone();
    for site in sites {
        mutant = mutant.with_site(*site, inst)?;
    }
    Ok(mutant)
}

fn sweep(
    cpu: &TestCpu,
    ctx: &AvidaContext,
    info: &CpuTestInfo,
    genome: &Genome,
    site_sets: Vec<Vec<usize>>,
) -> Result<Landscape, HardwareError> {
    let base_fitness = cpu.test_genome(&mut ctx.derived(0), info, genome)?.fitness;
    let inst = knockout_instruction(cpu);

    let knockouts = site_sets
        .into_par_iter()
        .enumerate()
        .map(|(i, sites)| {
            let mutant = knock_out(genome, &sites, inst)?;
            let mut run_ctx = ctx.derived(i as u64 + 1);
            let fitness = cpu.test_genome(&mut run_ctx, info, &mutant)?.fitness;
            Ok(Knockout {
                sites,
                fitness,
                class: KnockoutClass::classify(base_fitness, fitness),
            })
        })
        .collect::<Result<Vec<_>, HardwareError>>()?;

    Ok(Landscape {
        base_fitness,
        knockouts,
    })
}

/// Knocks out each site in turn.
pub fn single_knockouts(
    cpu: &TestCpu,
    ctx: &AvidaContext,
    info: &CpuTestInfo,
    genome: &Genome,
) -> Result<Landscape, HardwareError> {
    let sites = (0..genome.len()).map(|site| vec![site]).collect();
    sweep(cpu, ctx, info, genome, sites)
}

/// Knocks out every unordered pair of distinct sites.
pub fn double_knockouts(
    cpu: &TestCpu,
    ctx: &AvidaContext,
    info: &CpuTestInfo,
    genome: &Genome,
) -> Result<Landscape, HardwareError> {
    let n = genome.len();
    let pairs = (0..n)
        .flat_map(|a| (a + 1..n).map(move |b| vec![a, b]))
        .collect();
    sweep(cpu, ctx, info, genome, pairs)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::environment::Environment;
    use crate::hardware::isa::HardwareKind;
    use crate::utils::test_utils::utils::{default_set, exact_config, stack_ancestor};
    use std::sync::Arc;

    fn stack_cpu() -> TestCpu {
        TestCpu::new(
            default_set(HardwareKind::FourStack),
            exact_config(),
            Arc::new(Environment::logic9()),
            1.0,
        )
    }

    #[test]
    fn classification_thresholds() {
        assert_eq!(KnockoutClass::classify(2.0, 0.0), KnockoutClass::Lethal);
        assert_eq!(KnockoutClass::classify(2.0, 1.0), KnockoutClass::Detrimental);
        assert_eq!(KnockoutClass::classify(2.0, 2.0), KnockoutClass::Neutral);
        assert_eq!(KnockoutClass::classify(2.0, 3.0), KnockoutClass::Beneficial);
    }

    #[test]
    fn single_knockouts_cover_every_site() {
        let cpu = stack_cpu();
        let genome = stack_ancestor(cpu.inst_set());
        let ctx = AvidaContext::new(21);
        let landscape = single_knockouts(&cpu, &ctx, &CpuTestInfo::default(), &genome).unwrap();
        assert!(landscape.base_fitness > 0.0);
        assert_eq!(landscape.knockouts.len(), genome.len());
        for (site, knockout) in landscape.knockouts.iter().enumerate() {
            assert_eq!(knockout.sites, vec![site]);
        }
        // Losing the divide instruction (site 11) kills replication.
        assert_eq!(landscape.knockouts[11].class, KnockoutClass::Lethal);
        let total: usize = [
            KnockoutClass::Lethal,
            KnockoutClass::Detrimental,
            KnockoutClass::Neutral,
            KnockoutClass::Beneficial,
        ]
        .iter()
        .map(|c| landscape.count(*c))
        .sum();
        assert_eq!(total, genome.len());
    }

    #[test]
    fn sweeps_are_reproducible() {
        let cpu = stack_cpu();
        let genome = stack_ancestor(cpu.inst_set());
        let ctx = AvidaContext::new(22);
        let a = double_knockouts(&cpu, &ctx, &CpuTestInfo::default(), &genome).unwrap();
        let b = double_knockouts(&cpu, &ctx, &CpuTestInfo::default(), &genome).unwrap();
        assert_eq!(a, b);
        assert_eq!(a.knockouts.len(), genome.len() * (genome.len() - 1) / 2);
        assert_eq!(a.knockouts[0].sites, vec![0, 1]);
    }
}
