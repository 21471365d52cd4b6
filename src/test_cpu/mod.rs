//! Isolated evaluation of genomes.
//!
//! Every test builds its own hardware and organism state, so runs never
//! share registers, stacks, memory or merit; the only input besides the
//! genome is the caller's random stream. A tick ceiling of
//! `time_mod * genome length` bounds every run, even for genomes that loop
//! forever.

pub mod landscape;

use crate::config::{AvidaConfig, HardwareConfig};
use crate::environment::Environment;
use crate::hardware::context::AvidaContext;
use crate::hardware::create_hardware;
use crate::hardware::errors::HardwareError;
use crate::hardware::genome::Genome;
use crate::hardware::isa::InstructionSet;
use crate::hardware::merit::Merit;
use crate::organism::{OrgIo, Phenotype};
use std::sync::Arc;

/// How a genome should be tested.
#[derive(Clone, Debug, PartialEq)]
pub struct CpuTestInfo {
    /// Generations to follow: 1 tests only the genome itself.
    pub generation_tests: usize,
    pub use_random_inputs: bool,
    /// Tick ceiling per generation, as a multiple of genome length.
    pub time_mod: u64,
}

impl Default for CpuTestInfo {
    fn default() -> Self {
        Self {
            generation_tests: 1,
            use_random_inputs: false,
            time_mod: 20,
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct CpuTestResult {
    /// Divided within the tick ceiling.
    pub is_viable: bool,
    pub fitness: f64,
    pub merit: Merit,
    pub gestation_time: u64,
    pub copied_size: usize,
    pub executed_size: usize,
    /// Completions per task during the first gestation.
    pub tasks: Vec<u32>,
    pub offspring: Option<Genome>,
    pub faults: u64,
    /// The first offspring is identical to the tested genome.
    pub is_true_breeding: bool,
    /// Generations that divided successfully, at most `generation_tests`.
    pub generations: usize,
}

impl CpuTestResult {
    fn failed(num_tasks: usize) -> Self {
        Self {
            is_viable: false,
            fitness: 0.0,
            merit: Merit::ZERO,
            gestation_time: 0,
            copied_size: 0,
            executed_size: 0,
            tasks: vec![0; num_tasks],
            offspring: None,
            faults: 0,
            is_true_breeding: false,
            generations: 0,
        }
    }
}

/// One generation's outcome.
struct Gestation {
    phenotype: Phenotype,
    offspring: Option<Genome>,
}

#[derive(Clone)]
pub struct TestCpu {
    inst_set: Arc<InstructionSet>,
    config: Arc<HardwareConfig>,
    env: Arc<Environment>,
    default_bonus: f64,
}

impl TestCpu {
    pub fn new(
        inst_set: Arc<InstructionSet>,
        config: Arc<HardwareConfig>,
        env: Arc<Environment>,
        default_bonus: f64,
    ) -> Self {
        Self {
            inst_set,
            config,
            env,
            default_bonus,
        }
    }

    pub fn from_config(cfg: &AvidaConfig, inst_set: Arc<InstructionSet>) -> Self {
        Self::new(
            inst_set,
            Arc::new(cfg.hardware.clone()),
            Arc::new(Environment::logic9()),
            cfg.default_bonus,
        )
    }

    pub fn inst_set(&self) -> &Arc<InstructionSet> {
        &self.inst_set
    }

    /// Runs `genome` to its first divide, then optionally its descendants,
    /// and reports the first generation.
    pub fn test_genome(
        &self,
        ctx: &mut AvidaContext,
        info: &CpuTestInfo,
        genome: &Genome,
    ) -> Result<CpuTestResult, HardwareError> {
        let first = self.gestate(ctx, info, genome)?;
        let Some(child) = first.offspring.clone() else {
            let mut result = CpuTestResult::failed(self.env.num_tasks());
            result.tasks = first.phenotype.cur_task_count;
            result.faults = first.phenotype.cur_num_faults;
            return Ok(result);
        };

        let mut generations = 1;
        let mut next = child.clone();
        while generations < info.generation_tests {
            match self.gestate(ctx, info, &next)?.offspring {
                Some(genome) => {
                    next = genome;
                    generations += 1;
                }
                None => break,
            }
        }

        let phenotype = first.phenotype;
        Ok(CpuTestResult {
            is_viable: true,
            fitness: phenotype.fitness,
            merit: phenotype.merit,
            gestation_time: phenotype.gestation_time,
            copied_size: phenotype.copied_size,
            executed_size: phenotype.executed_size,
            tasks: phenotype.last_task_count,
            is_true_breeding: &child == genome,
            offspring: Some(child),
            faults: phenotype.last_num_faults,
            generations,
        })
    }

    /// Quick viability check used before committing a birth.
    pub fn is_viable(&self, ctx: &mut AvidaContext, genome: &Genome) -> Result<bool, HardwareError> {
        Ok(self.test_genome(ctx, &CpuTestInfo::default(), genome)?.is_viable)
    }

    /// Fitness `genome`'s first offspring would have.
    pub fn child_fitness(&self, ctx: &mut AvidaContext, genome: &Genome) -> Result<f64, HardwareError> {
        let info = CpuTestInfo::default();
        match self.test_genome(ctx, &info, genome)?.offspring {
            Some(child) => Ok(self.test_genome(ctx, &info, &child)?.fitness),
            None => Ok(0.0),
        }
    }

    fn gestate(
        &self,
        ctx: &mut AvidaContext,
        info: &CpuTestInfo,
        genome: &Genome,
    ) -> Result<Gestation, HardwareError> {
        let mut hardware = create_hardware(
            self.inst_set.kind(),
            Arc::clone(&self.inst_set),
            Arc::clone(&self.config),
        )?;
        hardware.load_genome(genome)?;

        let env = Arc::new(Environment {
            use_random_inputs: info.use_random_inputs,
            ..(*self.env).clone()
        });
        let inputs = env.setup_inputs(ctx);
        let phenotype = Phenotype::injected(self.default_bonus, env.num_tasks(), genome.len());
        let mut io = OrgIo::new(env, inputs, phenotype);

        let limit = info.time_mod.saturating_mul(genome.len() as u64).max(1);
        for _ in 0..limit {
            hardware.single_process(ctx, &mut io);
            io.phenotype.tick();
            if io.has_offspring() {
                break;
            }
        }

        let offspring = io.take_offspring().into_iter().next().map(|o| o.genome);
        Ok(Gestation {
            phenotype: io.phenotype,
            offspring,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hardware::isa::HardwareKind;
    use crate::utils::test_utils::utils::{default_set, exact_config, heads_ancestor, stack_ancestor};

    fn test_cpu(kind: HardwareKind) -> TestCpu {
        TestCpu::new(default_set(kind), exact_config(), Arc::new(Environment::logic9()), 1.0)
    }

    #[test]
    fn heads_ancestor_is_viable_and_true_breeding() {
        let cpu = test_cpu(HardwareKind::Heads);
        let genome = heads_ancestor(cpu.inst_set());
        let mut ctx = AvidaContext::new(1);
        let info = CpuTestInfo {
            generation_tests: 3,
            ..CpuTestInfo::default()
        };
        let result = cpu.test_genome(&mut ctx, &info, &genome).unwrap();
        assert!(result.is_viable);
        assert!(result.is_true_breeding);
        assert_eq!(result.generations, 3);
        assert_eq!(result.copied_size, 100);
        assert!((300..600).contains(&result.gestation_time));
        assert_eq!(result.fitness, result.merit.value() / result.gestation_time as f64);
        assert!(result.tasks.iter().all(|count| *count == 0));
    }

    #[test]
    fn stack_ancestor_is_viable() {
        let cpu = test_cpu(HardwareKind::FourStack);
        let genome = stack_ancestor(cpu.inst_set());
        let mut ctx = AvidaContext::new(2);
        let result = cpu.test_genome(&mut ctx, &CpuTestInfo::default(), &genome).unwrap();
        assert!(result.is_viable);
        assert_eq!(result.offspring.as_ref().map(Genome::len), Some(15));
    }

    #[test]
    fn infinite_loop_hits_the_ceiling() {
        let cpu = test_cpu(HardwareKind::Heads);
        let set = cpu.inst_set();
        // Nothing but nops: the IP circles memory until the ceiling.
        let genome = Genome::from_symbols("aaaaaaaaaa", set).unwrap();
        let mut ctx = AvidaContext::new(3);
        let result = cpu.test_genome(&mut ctx, &CpuTestInfo::default(), &genome).unwrap();
        assert!(!result.is_viable);
        assert_eq!(result.fitness, 0.0);
        assert_eq!(result.offspring, None);
        assert_eq!(result.generations, 0);
    }

    #[test]
    fn same_seed_same_result() {
        let cpu = test_cpu(HardwareKind::Heads);
        let genome = heads_ancestor(cpu.inst_set());
        let info = CpuTestInfo {
            use_random_inputs: true,
            ..CpuTestInfo::default()
        };
        let a = cpu.test_genome(&mut AvidaContext::new(9), &info, &genome).unwrap();
        let b = cpu.test_genome(&mut AvidaContext::new(9), &info, &genome).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn concurrent_runs_are_isolated() {
        let cpu = test_cpu(HardwareKind::Heads);
        let set = cpu.inst_set();
        let ancestor = heads_ancestor(set);
        let broken = Genome::from_symbols("aaaaaaaaaa", set).unwrap();
        let info = CpuTestInfo::default();

        let alone_a = cpu.test_genome(&mut AvidaContext::new(4), &info, &ancestor).unwrap();
        let alone_b = cpu.test_genome(&mut AvidaContext::new(5), &info, &broken).unwrap();

        let (together_a, together_b) = std::thread::scope(|scope| {
            let a = scope.spawn(|| cpu.test_genome(&mut AvidaContext::new(4), &info, &ancestor));
            let b = scope.spawn(|| cpu.test_genome(&mut AvidaContext::new(5), &info, &broken));
            (a.join().unwrap().unwrap(), b.join().unwrap().unwrap())
        });
        assert_eq!(alone_a, together_a);
        assert_eq!(alone_b, together_b);
    }

    #[test]
    fn child_fitness_matches_parent_for_exact_copies() {
        let cpu = test_cpu(HardwareKind::Heads);
        let genome = heads_ancestor(cpu.inst_set());
        let mut ctx = AvidaContext::new(6);
        let parent = cpu.test_genome(&mut ctx, &CpuTestInfo::default(), &genome).unwrap();
        assert_eq!(cpu.child_fitness(&mut ctx, &genome).unwrap(), parent.fitness);
        assert!(cpu.is_viable(&mut ctx, &genome).unwrap());
    }
}
