//! Run configuration, read from `avida.cfg`-style files.
//!
//! ```text
//! WORLD_X 60          # comments run to end of line
//! COPY_MUT_PROB 0.0075
//! ```
//!
//! Every setting has a default matching the classic configuration, so an
//! empty file is a valid configuration. Unknown names are reported and
//! skipped; malformed values are errors.

use crate::hardware::errors::HardwareError;
use crate::hardware::isa::{HardwareKind, InstructionSet};
use crate::hardware::merit::SizeMeritMethod;
use crate::hardware::mutation::{MutationConfig, MutationRates};
use crate::warn;
use std::path::Path;
use std::str::FromStr;

/// Threads run per hardware tick.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ThreadSlicing {
    /// One instruction from one thread, then rotate.
    One,
    /// One instruction from every thread.
    All,
}

/// How freshly allocated offspring memory is filled.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum AllocMethod {
    /// The default instruction.
    Default,
    /// Whatever the memory held last time it was that long.
    Necro,
    /// Random instructions.
    Random,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DivideMethod {
    /// Parent keeps running where it was.
    Offspring,
    /// Parent is reset as if it were newly born.
    Split,
}

/// Population scheduling policy.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SlicingMethod {
    Constant,
    Probabilistic,
    Integrated,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DeathMethod {
    Never,
    /// Die after `AGE_LIMIT` ticks.
    Fixed,
    /// Die after `AGE_LIMIT * genome length` ticks.
    GenomeLength,
}

/// Settings consumed by the hardware itself.
#[derive(Clone, Debug, PartialEq)]
pub struct HardwareConfig {
    pub max_cpu_threads: usize,
    pub thread_slicing: ThreadSlicing,
    pub max_label_exe_size: usize,
    pub min_genome_size: usize,
    pub max_genome_size: usize,
    pub child_size_range: f64,
    pub min_copied_lines: f64,
    pub min_exe_lines: f64,
    pub require_allocate: bool,
    pub alloc_method: AllocMethod,
    pub divide_method: DivideMethod,
    pub size_merit_method: SizeMeritMethod,
    pub base_const_merit: f64,
    pub mutations: MutationConfig,
}

impl Default for HardwareConfig {
    fn default() -> Self {
        Self {
            max_cpu_threads: 1,
            thread_slicing: ThreadSlicing::One,
            max_label_exe_size: 1,
            min_genome_size: 8,
            max_genome_size: 2048,
            child_size_range: 2.0,
            min_copied_lines: 0.5,
            min_exe_lines: 0.5,
            require_allocate: true,
            alloc_method: AllocMethod::Default,
            divide_method: DivideMethod::Split,
            size_merit_method: SizeMeritMethod::LeastSize,
            base_const_merit: 100.0,
            mutations: MutationConfig::default(),
        }
    }
}

impl HardwareConfig {
    /// Working memory must hold a parent plus an offspring up to the size
    /// bounds, with room for divide checks to reject oversized children.
    pub fn memory_limit(&self) -> usize {
        self.max_genome_size.saturating_mul(4).max(1)
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct AvidaConfig {
    pub hardware_type: HardwareKind,
    /// 0 picks a seed from the clock.
    pub random_seed: u64,
    pub world_x: usize,
    pub world_y: usize,
    pub ave_time_slice: u32,
    pub slicing_method: SlicingMethod,
    pub death_method: DeathMethod,
    pub age_limit: u64,
    pub default_bonus: f64,
    pub test_cpu_time_mod: u64,
    pub inst_set: Option<String>,
    pub start_creature: Option<String>,
    pub hardware: HardwareConfig,
}

impl Default for AvidaConfig {
    fn default() -> Self {
        Self {
            hardware_type: HardwareKind::Heads,
            random_seed: 0,
            world_x: 60,
            world_y: 60,
            ave_time_slice: 30,
            slicing_method: SlicingMethod::Probabilistic,
            death_method: DeathMethod::GenomeLength,
            age_limit: 20,
            default_bonus: 1.0,
            test_cpu_time_mod: 20,
            inst_set: None,
            start_creature: None,
            hardware: HardwareConfig::default(),
        }
    }
}

fn parse_value<T: FromStr>(line: usize, name: &str, value: &str) -> Result<T, HardwareError> {
    value.parse().map_err(|_| HardwareError::Config {
        line,
        reason: format!("invalid value '{}' for {}", value, name),
    })
}

fn parse_prob(line: usize, name: &str, value: &str) -> Result<f64, HardwareError> {
    let p: f64 = parse_value(line, name, value)?;
    if !(0.0..=1.0).contains(&p) {
        return Err(HardwareError::Config {
            line,
            reason: format!("{} must be a probability, got {}", name, value),
        });
    }
    Ok(p)
}

fn out_of_range(line: usize, name: &str, value: &str) -> HardwareError {
    HardwareError::Config {
        line,
        reason: format!("{} has no option '{}'", name, value),
    }
}

impl AvidaConfig {
    pub fn load(path: impl AsRef<Path>) -> Result<Self, HardwareError> {
        let text = std::fs::read_to_string(path)?;
        Self::from_cfg_str(&text)
    }

    pub fn from_cfg_str(text: &str) -> Result<Self, HardwareError> {
        let mut cfg = Self::default();
        for (idx, raw) in text.lines().enumerate() {
            let line = raw.split('#').next().unwrap_or("").trim();
            if line.is_empty() {
                continue;
            }
            let mut fields = line.split_whitespace();
            let (Some(name), Some(value)) = (fields.next(), fields.next()) else {
                return Err(HardwareError::Config {
                    line: idx + 1,
                    reason: format!("'{}' has no value", line),
                });
            };
            cfg.set(idx + 1, name, value)?;
        }
        cfg.validate()?;
        Ok(cfg)
    }

    /// Applies one `NAME value` setting.
    pub fn set(&mut self, line: usize, name: &str, value: &str) -> Result<(), HardwareError> {
        let hw = &mut self.hardware;
        match name {
            "HARDWARE_TYPE" => {
                self.hardware_type =
                    HardwareKind::from_name(value).ok_or_else(|| out_of_range(line, name, value))?
            }
            "RANDOM_SEED" => {
                let seed: i64 = parse_value(line, name, value)?;
                self.random_seed = seed.unsigned_abs();
            }
            "WORLD_X" => self.world_x = parse_value(line, name, value)?,
            "WORLD_Y" => self.world_y = parse_value(line, name, value)?,
            "AVE_TIME_SLICE" => self.ave_time_slice = parse_value(line, name, value)?,
            "SLICING_METHOD" => {
                self.slicing_method = match value {
                    "0" => SlicingMethod::Constant,
                    "1" => SlicingMethod::Probabilistic,
                    "2" => SlicingMethod::Integrated,
                    _ => return Err(out_of_range(line, name, value)),
                }
            }
            "DEATH_METHOD" => {
                self.death_method = match value {
                    "0" => DeathMethod::Never,
                    "1" => DeathMethod::Fixed,
                    "2" => DeathMethod::GenomeLength,
                    _ => return Err(out_of_range(line, name, value)),
                }
            }
            "AGE_LIMIT" => self.age_limit = parse_value(line, name, value)?,
            "DEFAULT_BONUS" => self.default_bonus = parse_value(line, name, value)?,
            "TEST_CPU_TIME_MOD" => self.test_cpu_time_mod = parse_value(line, name, value)?,
            "INST_SET" => self.inst_set = (value != "-").then(|| value.to_string()),
            "START_CREATURE" => self.start_creature = (value != "-").then(|| value.to_string()),
            "BASE_MERIT_METHOD" => {
                let index: i64 = parse_value(line, name, value)?;
                hw.size_merit_method =
                    SizeMeritMethod::from_index(index).ok_or_else(|| out_of_range(line, name, value))?;
            }
            "BASE_CONST_MERIT" => hw.base_const_merit = parse_value(line, name, value)?,
            "MAX_CPU_THREADS" => hw.max_cpu_threads = parse_value(line, name, value)?,
            "THREAD_SLICING_METHOD" => {
                hw.thread_slicing = match value {
                    "0" => ThreadSlicing::One,
                    "1" => ThreadSlicing::All,
                    _ => return Err(out_of_range(line, name, value)),
                }
            }
            "MAX_LABEL_EXE_SIZE" => hw.max_label_exe_size = parse_value(line, name, value)?,
            "MIN_GENOME_SIZE" => hw.min_genome_size = parse_value(line, name, value)?,
            "MAX_GENOME_SIZE" => hw.max_genome_size = parse_value(line, name, value)?,
            "CHILD_SIZE_RANGE" => hw.child_size_range = parse_value(line, name, value)?,
            "MIN_COPIED_LINES" => hw.min_copied_lines = parse_prob(line, name, value)?,
            "MIN_EXE_LINES" => hw.min_exe_lines = parse_prob(line, name, value)?,
            "REQUIRE_ALLOCATE" => hw.require_allocate = parse_value::<u8>(line, name, value)? != 0,
            "ALLOC_METHOD" => {
                hw.alloc_method = match value {
                    "0" => AllocMethod::Default,
                    "1" => AllocMethod::Necro,
                    "2" => AllocMethod::Random,
                    _ => return Err(out_of_range(line, name, value)),
                }
            }
            "DIVIDE_METHOD" => {
                hw.divide_method = match value {
                    "0" | "2" => DivideMethod::Offspring,
                    "1" => DivideMethod::Split,
                    _ => return Err(out_of_range(line, name, value)),
                }
            }
            "COPY_MUT_PROB" => hw.mutations.copy_mut_prob = parse_prob(line, name, value)?,
            "DIVIDE_MUT_PROB" => hw.mutations.divide.single_sub = parse_prob(line, name, value)?,
            "DIVIDE_INS_PROB" => hw.mutations.divide.insertion = parse_prob(line, name, value)?,
            "DIVIDE_DEL_PROB" => hw.mutations.divide.deletion = parse_prob(line, name, value)?,
            "DIV_MUT_PROB" => hw.mutations.divide.point_sub = parse_prob(line, name, value)?,
            "PARENT_MUT_PROB" => hw.mutations.germline.point_sub = parse_prob(line, name, value)?,
            _ => warn!("config line {}: unknown setting {} ignored", line, name),
        }
        Ok(())
    }

    fn validate(&self) -> Result<(), HardwareError> {
        let hw = &self.hardware;
        let problem = if hw.min_genome_size == 0 || hw.min_genome_size > hw.max_genome_size {
            Some("MIN_GENOME_SIZE must be between 1 and MAX_GENOME_SIZE")
        } else if hw.max_cpu_threads == 0 || hw.max_cpu_threads > 64 {
            Some("MAX_CPU_THREADS must be between 1 and 64")
        } else if !(hw.child_size_range >= 1.0) {
            Some("CHILD_SIZE_RANGE must be at least 1.0")
        } else if self.world_x == 0 || self.world_y == 0 {
            Some("world must have at least one cell")
        } else {
            None
        };
        match problem {
            Some(reason) => Err(HardwareError::Config {
                line: 0,
                reason: reason.to_string(),
            }),
            None => Ok(()),
        }
    }

    pub fn population_size(&self) -> usize {
        self.world_x * self.world_y
    }

    /// The configured instruction set file, or the hardware's default set.
    pub fn instruction_set(&self) -> Result<InstructionSet, HardwareError> {
        match &self.inst_set {
            Some(path) => {
                let text = std::fs::read_to_string(path)?;
                InstructionSet::parse(self.hardware_type, &text)
            }
            None => Ok(InstructionSet::default_for(self.hardware_type)),
        }
    }

    pub fn divide_rates(&self) -> &MutationRates {
        &self.hardware.mutations.divide
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_file_gives_defaults() {
        assert_eq!(AvidaConfig::from_cfg_str("").unwrap(), AvidaConfig::default());
    }

    #[test]
    fn classic_defaults() {
        let cfg = AvidaConfig::default();
        assert_eq!(cfg.ave_time_slice, 30);
        assert_eq!(cfg.population_size(), 3600);
        assert_eq!(cfg.hardware.mutations.copy_mut_prob, 0.0075);
        assert_eq!(cfg.hardware.mutations.divide.insertion, 0.05);
        assert_eq!(cfg.hardware.divide_method, DivideMethod::Split);
        assert_eq!(cfg.hardware.size_merit_method, SizeMeritMethod::LeastSize);
    }

    #[test]
    fn settings_and_comments_parse() {
        let text = "\
# header
WORLD_X 10   # narrow
WORLD_Y 5
HARDWARE_TYPE 1
SLICING_METHOD 2
COPY_MUT_PROB 0.01
PARENT_MUT_PROB 0.5
REQUIRE_ALLOCATE 0
ALLOC_METHOD 1
MAX_CPU_THREADS 4
THREAD_SLICING_METHOD 1
START_CREATURE default-heads.org
";
        let cfg = AvidaConfig::from_cfg_str(text).unwrap();
        assert_eq!(cfg.population_size(), 50);
        assert_eq!(cfg.hardware_type, HardwareKind::FourStack);
        assert_eq!(cfg.slicing_method, SlicingMethod::Integrated);
        assert_eq!(cfg.hardware.mutations.copy_mut_prob, 0.01);
        assert_eq!(cfg.hardware.mutations.germline.point_sub, 0.5);
        assert!(!cfg.hardware.require_allocate);
        assert_eq!(cfg.hardware.alloc_method, AllocMethod::Necro);
        assert_eq!(cfg.hardware.max_cpu_threads, 4);
        assert_eq!(cfg.hardware.thread_slicing, ThreadSlicing::All);
        assert_eq!(cfg.start_creature.as_deref(), Some("default-heads.org"));
    }

    #[test]
    fn unknown_settings_are_skipped() {
        let cfg = AvidaConfig::from_cfg_str("NOT_A_SETTING 3\nWORLD_X 7\n").unwrap();
        assert_eq!(cfg.world_x, 7);
    }

    #[test]
    fn bad_values_report_their_line() {
        let err = AvidaConfig::from_cfg_str("WORLD_X 3\nCOPY_MUT_PROB lots\n").unwrap_err();
        assert!(matches!(err, HardwareError::Config { line: 2, .. }));
        let err = AvidaConfig::from_cfg_str("COPY_MUT_PROB 1.5\n").unwrap_err();
        assert!(matches!(err, HardwareError::Config { line: 1, .. }));
        let err = AvidaConfig::from_cfg_str("SLICING_METHOD 9\n").unwrap_err();
        assert!(matches!(err, HardwareError::Config { line: 1, .. }));
        let err = AvidaConfig::from_cfg_str("WORLD_X\n").unwrap_err();
        assert!(matches!(err, HardwareError::Config { line: 1, .. }));
    }

    #[test]
    fn inconsistent_sizes_are_rejected() {
        let err = AvidaConfig::from_cfg_str("MIN_GENOME_SIZE 100\nMAX_GENOME_SIZE 50\n").unwrap_err();
        assert!(matches!(err, HardwareError::Config { line: 0, .. }));
    }
}
