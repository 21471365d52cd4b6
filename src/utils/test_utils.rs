//! Helpers shared by hardware, scheduler and world tests.

#[cfg(test)]
pub mod utils {
    use crate::config::HardwareConfig;
    use crate::hardware::genome::Genome;
    use crate::hardware::isa::{HardwareKind, InstructionSet};
    use crate::hardware::mutation::MutationConfig;
    use std::sync::Arc;

    pub fn heads_ancestor(set: &InstructionSet) -> Genome {
        Genome::ancestor(set).expect("heads ancestor")
    }

    pub fn stack_ancestor(set: &InstructionSet) -> Genome {
        Genome::ancestor(set).expect("4stack ancestor")
    }

    pub fn default_set(kind: HardwareKind) -> Arc<InstructionSet> {
        Arc::new(InstructionSet::default_for(kind))
    }

    /// Default hardware settings with every mutation rate at zero, so runs
    /// are exact copies.
    pub fn exact_config() -> Arc<HardwareConfig> {
        Arc::new(HardwareConfig {
            mutations: MutationConfig::none(),
            ..HardwareConfig::default()
        })
    }

    /// Loose limits for exercising divide boundaries by hand: any split with
    /// both halves in `[min, max]` is viable.
    pub fn boundary_config(min: usize, max: usize) -> Arc<HardwareConfig> {
        Arc::new(HardwareConfig {
            min_genome_size: min,
            max_genome_size: max,
            child_size_range: 100.0,
            min_copied_lines: 0.0,
            min_exe_lines: 0.0,
            require_allocate: false,
            mutations: MutationConfig::none(),
            ..HardwareConfig::default()
        })
    }
}
