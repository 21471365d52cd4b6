//! A well-mixed population: no topology, any slot can receive any birth.
//!
//! The configured scheduler picks which organism runs each tick. One update
//! is `ave_time_slice` ticks per living organism, counted at the start of
//! the update.

use crate::config::{AvidaConfig, DeathMethod, HardwareConfig};
use crate::environment::Environment;
use crate::hardware::context::AvidaContext;
use crate::hardware::create_hardware;
use crate::hardware::errors::HardwareError;
use crate::hardware::fault::Fault;
use crate::hardware::genome::Genome;
use crate::hardware::interface::Offspring;
use crate::hardware::isa::InstructionSet;
use crate::hardware::merit::Merit;
use crate::info;
use crate::organism::{Organism, Phenotype};
use crate::schedule::{Schedule, create_schedule};
use crate::types::hash::Hash;
use std::collections::HashMap;
use std::sync::Arc;

/// The `START_CREATURE` listing, or the built-in ancestor for `set`.
pub fn start_creature(cfg: &AvidaConfig, set: &InstructionSet) -> Result<Genome, HardwareError> {
    match &cfg.start_creature {
        Some(path) => {
            let text = std::fs::read_to_string(path)?;
            Genome::from_names(&text, set)
        }
        None => Genome::ancestor(set),
    }
}

/// Summary of one update.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct UpdateStats {
    pub update: u64,
    pub organisms: usize,
    pub births: u64,
    pub deaths: u64,
    pub faults: u64,
    pub ave_merit: f64,
    pub ave_fitness: f64,
    pub max_fitness: f64,
    pub ave_gestation: f64,
    pub ave_genome_size: f64,
    pub num_genotypes: usize,
    /// Most common genotype and its abundance.
    pub dominant: Option<(Hash, usize)>,
    /// Organisms whose last gestation performed each task.
    pub task_counts: Vec<usize>,
}

pub struct World {
    ctx: AvidaContext,
    inst_set: Arc<InstructionSet>,
    hw_config: Arc<HardwareConfig>,
    env: Arc<Environment>,
    slots: Vec<Option<Organism>>,
    schedule: Box<dyn Schedule>,
    slot_faults: Vec<u64>,
    num_organisms: usize,
    update: u64,
    ave_time_slice: u32,
    death_method: DeathMethod,
    age_limit: u64,
    default_bonus: f64,
}

impl World {
    pub fn new(cfg: &AvidaConfig) -> Result<Self, HardwareError> {
        let inst_set = Arc::new(cfg.instruction_set()?);
        Ok(Self::with_parts(
            cfg,
            inst_set,
            Arc::new(Environment::logic9()),
            AvidaContext::from_config_seed(cfg.random_seed),
        ))
    }

    pub fn with_parts(
        cfg: &AvidaConfig,
        inst_set: Arc<InstructionSet>,
        env: Arc<Environment>,
        ctx: AvidaContext,
    ) -> Self {
        let size = cfg.population_size();
        Self {
            ctx,
            inst_set,
            hw_config: Arc::new(cfg.hardware.clone()),
            env,
            slots: (0..size).map(|_| None).collect(),
            schedule: create_schedule(cfg.slicing_method, size, cfg.ave_time_slice),
            slot_faults: vec![0; size],
            num_organisms: 0,
            update: 0,
            ave_time_slice: cfg.ave_time_slice.max(1),
            death_method: cfg.death_method,
            age_limit: cfg.age_limit,
            default_bonus: cfg.default_bonus,
        }
    }

    pub fn inst_set(&self) -> &Arc<InstructionSet> {
        &self.inst_set
    }

    pub fn seed(&self) -> u64 {
        self.ctx.seed()
    }

    pub fn size(&self) -> usize {
        self.slots.len()
    }

    pub fn num_organisms(&self) -> usize {
        self.num_organisms
    }

    pub fn update(&self) -> u64 {
        self.update
    }

    pub fn organism(&self, slot: usize) -> Option<&Organism> {
        self.slots.get(slot).and_then(Option::as_ref)
    }

    /// Faults raised so far by the organisms that lived in each slot.
    pub fn slot_faults(&self) -> &[u64] {
        &self.slot_faults
    }

    /// The `START_CREATURE` listing, or the built-in ancestor for the
    /// configured hardware.
    pub fn start_creature(&self, cfg: &AvidaConfig) -> Result<Genome, HardwareError> {
        start_creature(cfg, &self.inst_set)
    }

    /// Places `genome` in `slot` with the merit of a freshly injected
    /// organism, replacing any occupant.
    pub fn inject(&mut self, genome: Genome, slot: usize) -> Result<(), HardwareError> {
        if slot >= self.slots.len() {
            return Err(HardwareError::IndexOutOfRange {
                index: slot,
                size: self.slots.len(),
            });
        }
        let phenotype = Phenotype::injected(self.default_bonus, self.env.num_tasks(), genome.len());
        let organism = self.build_organism(genome, phenotype)?;
        self.place(slot, organism);
        Ok(())
    }

    fn build_organism(&mut self, genome: Genome, phenotype: Phenotype) -> Result<Organism, HardwareError> {
        let hardware = create_hardware(
            self.inst_set.kind(),
            Arc::clone(&self.inst_set),
            Arc::clone(&self.hw_config),
        )?;
        Organism::new(&mut self.ctx, genome, hardware, Arc::clone(&self.env), phenotype)
    }

    fn place(&mut self, slot: usize, organism: Organism) {
        self.schedule.adjust(slot, &organism.merit());
        if self.slots[slot].replace(organism).is_none() {
            self.num_organisms += 1;
        }
    }

    fn kill(&mut self, slot: usize) {
        if self.slots[slot].take().is_some() {
            self.num_organisms -= 1;
        }
        self.schedule.adjust(slot, &Merit::ZERO);
    }

    /// An empty slot if there is one, otherwise any slot.
    fn birth_slot(&mut self) -> usize {
        let empty: Vec<usize> = self
            .slots
            .iter()
            .enumerate()
            .filter(|(_, s)| s.is_none())
            .map(|(i, _)| i)
            .collect();
        if empty.is_empty() {
            self.ctx.random_index(self.slots.len())
        } else {
            empty[self.ctx.random_index(empty.len())]
        }
    }

    /// Returns the slot the child landed in.
    fn birth(&mut self, parent_slot: usize, offspring: Offspring) -> Result<usize, HardwareError> {
        let Some(parent) = self.organism(parent_slot) else {
            return Err(HardwareError::IndexOutOfRange {
                index: parent_slot,
                size: self.slots.len(),
            });
        };
        let phenotype = Phenotype::offspring(parent.phenotype(), &offspring);
        let child = self.build_organism(offspring.genome, phenotype)?;
        let target = self.birth_slot();
        self.place(target, child);
        Ok(target)
    }

    /// Runs one tick of whichever organism the scheduler picks. Returns
    /// `None` when no organism can run.
    pub fn process_tick(&mut self) -> Result<Option<TickEvents>, HardwareError> {
        let Some(slot) = self.schedule.next_id(&mut self.ctx) else {
            return Ok(None);
        };
        let Some(organism) = self.slots[slot].as_mut() else {
            self.schedule.adjust(slot, &Merit::ZERO);
            return Ok(Some(TickEvents::default()));
        };

        organism.process(&mut self.ctx);
        let faults = organism.io_mut().take_faults();
        let births = organism.take_offspring();
        let merit = organism.merit();
        let expired = organism.is_expired(self.death_method, self.age_limit);
        self.slot_faults[slot] += faults.len() as u64;

        let mut events = TickEvents {
            faults: faults.into_iter().map(|fault| (slot, fault)).collect(),
            ..TickEvents::default()
        };
        if !births.is_empty() {
            self.schedule.adjust(slot, &merit);
        }
        for offspring in births {
            let target = self.birth(slot, offspring)?;
            events.births += 1;
            if target == slot {
                // The child replaced its own parent.
                return Ok(Some(events));
            }
        }
        if expired {
            self.kill(slot);
            events.deaths += 1;
        }
        Ok(Some(events))
    }

    /// Runs one update and logs its summary.
    pub fn run_update(&mut self) -> Result<UpdateStats, HardwareError> {
        let ticks = self.ave_time_slice as u64 * self.num_organisms as u64;
        let mut totals = TickEvents::default();
        for _ in 0..ticks {
            match self.process_tick()? {
                Some(events) => totals.add(events),
                None => break,
            }
        }
        self.update += 1;

        let stats = self.stats(&totals);
        info!(
            "update {}: {} organisms, {} genotypes (dominant {}), ave merit {:.2}, ave fitness {:.4}, ave gestation {:.1}, {} births, {} deaths",
            stats.update,
            stats.organisms,
            stats.num_genotypes,
            stats.dominant.map(|(hash, _)| hash.short()).unwrap_or_else(|| "-".to_string()),
            stats.ave_merit,
            stats.ave_fitness,
            stats.ave_gestation,
            stats.births,
            stats.deaths
        );
        Ok(stats)
    }

    fn stats(&self, totals: &TickEvents) -> UpdateStats {
        let mut stats = UpdateStats {
            update: self.update,
            organisms: self.num_organisms,
            births: totals.births,
            deaths: totals.deaths,
            faults: totals.faults.len() as u64,
            task_counts: vec![0; self.env.num_tasks()],
            ..UpdateStats::default()
        };
        if self.num_organisms == 0 {
            return stats;
        }
        let mut genotypes: HashMap<Hash, usize> = HashMap::new();
        for organism in self.slots.iter().flatten() {
            *genotypes.entry(organism.genome().digest()).or_default() += 1;
            let phenotype = organism.phenotype();
            stats.ave_merit += phenotype.merit.value();
            stats.ave_fitness += phenotype.fitness;
            stats.max_fitness = stats.max_fitness.max(phenotype.fitness);
            stats.ave_gestation += phenotype.gestation_time as f64;
            stats.ave_genome_size += organism.genome().len() as f64;
            for (count, done) in stats.task_counts.iter_mut().zip(&phenotype.last_task_count) {
                if *done > 0 {
                    *count += 1;
                }
            }
        }
        stats.num_genotypes = genotypes.len();
        stats.dominant = genotypes
            .into_iter()
            .max_by(|a, b| a.1.cmp(&b.1).then(b.0.cmp(&a.0)));
        let n = self.num_organisms as f64;
        stats.ave_merit /= n;
        stats.ave_fitness /= n;
        stats.ave_gestation /= n;
        stats.ave_genome_size /= n;
        stats
    }
}

/// What happened during one or more ticks.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct TickEvents {
    pub births: u64,
    pub deaths: u64,
    /// Every fault raised, with the slot that raised it.
    pub faults: Vec<(usize, Fault)>,
}

impl TickEvents {
    fn add(&mut self, other: TickEvents) {
        self.births += other.births;
        self.deaths += other.deaths;
        self.faults.extend(other.faults);
    }
}
