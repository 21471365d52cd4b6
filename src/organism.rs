//! Organisms: a CPU plus the phenotype its behaviour builds up.

use crate::config::DeathMethod;
use crate::environment::Environment;
use crate::hardware::Hardware;
use crate::hardware::context::AvidaContext;
use crate::hardware::errors::HardwareError;
use crate::hardware::fault::Fault;
use crate::hardware::genome::Genome;
use crate::hardware::interface::{Offspring, OrgInterface};
use crate::hardware::merit::Merit;
use crate::hardware::thread::IoBuffer;
use std::sync::Arc;

/// What an organism has done so far, split into the gestation in progress
/// (`cur_*`) and the last completed one (`last_*`).
#[derive(Clone, Debug, PartialEq)]
pub struct Phenotype {
    pub merit: Merit,
    pub cur_bonus: f64,
    pub last_bonus: f64,
    /// Ticks the last gestation took.
    pub gestation_time: u64,
    /// `time_used` when the current gestation began.
    pub gestation_start: u64,
    pub time_used: u64,
    /// `merit / gestation_time` of the last gestation.
    pub fitness: f64,
    pub genome_size: usize,
    pub copied_size: usize,
    pub executed_size: usize,
    pub cur_task_count: Vec<u32>,
    pub last_task_count: Vec<u32>,
    pub cur_num_faults: u64,
    pub last_num_faults: u64,
    pub generation: u64,
    pub num_divides: u64,
    default_bonus: f64,
}

impl Phenotype {
    pub fn new(default_bonus: f64, num_tasks: usize) -> Self {
        Self {
            merit: Merit::ZERO,
            cur_bonus: default_bonus,
            last_bonus: default_bonus,
            gestation_time: 0,
            gestation_start: 0,
            time_used: 0,
            fitness: 0.0,
            genome_size: 0,
            copied_size: 0,
            executed_size: 0,
            cur_task_count: vec![0; num_tasks],
            last_task_count: vec![0; num_tasks],
            cur_num_faults: 0,
            last_num_faults: 0,
            generation: 0,
            num_divides: 0,
            default_bonus,
        }
    }

    /// Phenotype of an organism placed by hand; merit starts at its length.
    pub fn injected(default_bonus: f64, num_tasks: usize, genome_len: usize) -> Self {
        Self {
            merit: Merit::new(genome_len as f64),
            genome_size: genome_len,
            copied_size: genome_len,
            executed_size: genome_len,
            ..Self::new(default_bonus, num_tasks)
        }
    }

    /// Phenotype of a newborn. It inherits the parent's last-gestation
    /// record, so statistics have something to show before its own first
    /// divide.
    pub fn offspring(parent: &Phenotype, offspring: &Offspring) -> Self {
        let num_tasks = parent.cur_task_count.len();
        Self {
            merit: offspring.merit,
            last_bonus: parent.last_bonus,
            gestation_time: parent.gestation_time,
            fitness: parent.fitness,
            genome_size: offspring.genome.len(),
            copied_size: offspring.copied_size,
            executed_size: offspring.executed_size,
            last_task_count: parent.last_task_count.clone(),
            last_num_faults: parent.last_num_faults,
            generation: parent.generation,
            ..Self::new(parent.default_bonus, num_tasks)
        }
    }

    pub fn tick(&mut self) {
        self.time_used += 1;
    }

    /// Closes the current gestation after a successful divide.
    pub fn divide_reset(&mut self, offspring: &Offspring) {
        self.merit = offspring.merit;
        self.gestation_time = self.time_used - self.gestation_start;
        self.gestation_start = self.time_used;
        self.fitness = if self.gestation_time > 0 {
            self.merit.value() / self.gestation_time as f64
        } else {
            0.0
        };
        self.genome_size = offspring.parent_genome_size;
        self.copied_size = offspring.copied_size;
        self.executed_size = offspring.executed_size;

        self.last_bonus = self.cur_bonus;
        self.cur_bonus = self.default_bonus;
        self.last_task_count = std::mem::replace(
            &mut self.cur_task_count,
            vec![0; self.last_task_count.len()],
        );
        self.last_num_faults = std::mem::take(&mut self.cur_num_faults);
        self.num_divides += 1;
        self.generation += 1;
    }

    /// Counts a task; the bonus only applies to its first completion in
    /// this gestation. Returns whether the bonus was applied.
    pub fn record_task(&mut self, index: usize, reward: f64) -> bool {
        let Some(count) = self.cur_task_count.get_mut(index) else {
            return false;
        };
        *count += 1;
        if *count == 1 {
            self.cur_bonus *= reward;
            return true;
        }
        false
    }

    pub fn record_fault(&mut self) {
        self.cur_num_faults += 1;
    }
}

/// The organism's side of [`OrgInterface`].
pub struct OrgIo {
    env: Arc<Environment>,
    inputs: [i32; 3],
    input_pointer: usize,
    pub phenotype: Phenotype,
    offspring: Vec<Offspring>,
    faults: Vec<Fault>,
}

impl OrgIo {
    pub fn new(env: Arc<Environment>, inputs: [i32; 3], phenotype: Phenotype) -> Self {
        Self {
            env,
            inputs,
            input_pointer: 0,
            phenotype,
            offspring: Vec::new(),
            faults: Vec::new(),
        }
    }

    pub fn inputs(&self) -> [i32; 3] {
        self.inputs
    }

    pub fn take_offspring(&mut self) -> Vec<Offspring> {
        std::mem::take(&mut self.offspring)
    }

    pub fn has_offspring(&self) -> bool {
        !self.offspring.is_empty()
    }

    /// Faults reported since the last call, oldest first.
    pub fn take_faults(&mut self) -> Vec<Fault> {
        std::mem::take(&mut self.faults)
    }
}

impl OrgInterface for OrgIo {
    fn next_input(&mut self, _ctx: &mut AvidaContext) -> i32 {
        let value = self.inputs[self.input_pointer];
        self.input_pointer = (self.input_pointer + 1) % self.inputs.len();
        value
    }

    fn output(&mut self, _ctx: &mut AvidaContext, value: i32, inputs: &IoBuffer) {
        for task in self.env.check_output(inputs, value) {
            let reward = self.env.reward(task);
            self.phenotype.record_task(task, reward);
        }
    }

    fn bonus(&self) -> f64 {
        self.phenotype.cur_bonus
    }

    fn fault(&mut self, fault: Fault) {
        self.phenotype.record_fault();
        self.faults.push(fault);
    }

    fn divide(&mut self, _ctx: &mut AvidaContext, offspring: Offspring) -> bool {
        self.phenotype.divide_reset(&offspring);
        self.offspring.push(offspring);
        true
    }
}

pub struct Organism {
    id: u64,
    genome: Genome,
    hardware: Box<dyn Hardware>,
    io: OrgIo,
}

impl Organism {
    /// Loads `genome` into `hardware` and draws the organism's inputs.
    pub fn new(
        ctx: &mut AvidaContext,
        genome: Genome,
        mut hardware: Box<dyn Hardware>,
        env: Arc<Environment>,
        phenotype: Phenotype,
    ) -> Result<Self, HardwareError> {
        hardware.load_genome(&genome)?;
        let inputs = env.setup_inputs(ctx);
        Ok(Self {
            id: ctx.ids.next_id(),
            genome,
            hardware,
            io: OrgIo::new(env, inputs, phenotype),
        })
    }

    /// One scheduler tick for this organism.
    pub fn process(&mut self, ctx: &mut AvidaContext) {
        self.hardware.single_process(ctx, &mut self.io);
        self.io.phenotype.tick();
    }

    pub fn id(&self) -> u64 {
        self.id
    }

    /// The genome the organism was born with.
    pub fn genome(&self) -> &Genome {
        &self.genome
    }

    pub fn hardware(&self) -> &dyn Hardware {
        self.hardware.as_ref()
    }

    pub fn hardware_mut(&mut self) -> &mut dyn Hardware {
        self.hardware.as_mut()
    }

    pub fn phenotype(&self) -> &Phenotype {
        &self.io.phenotype
    }

    pub fn io(&self) -> &OrgIo {
        &self.io
    }

    pub fn io_mut(&mut self) -> &mut OrgIo {
        &mut self.io
    }

    pub fn merit(&self) -> Merit {
        self.io.phenotype.merit
    }

    pub fn take_offspring(&mut self) -> Vec<Offspring> {
        self.io.take_offspring()
    }

    pub fn is_expired(&self, method: DeathMethod, age_limit: u64) -> bool {
        let age = self.io.phenotype.time_used;
        match method {
            DeathMethod::Never => false,
            DeathMethod::Fixed => age >= age_limit,
            DeathMethod::GenomeLength => age >= age_limit.saturating_mul(self.genome.len() as u64),
        }
    }
}
