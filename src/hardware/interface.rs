//! The seam between the hardware and whatever owns the organism.
//!
//! Hardware never touches population state directly. Inputs, outputs, task
//! bonuses, fault reports and births all go through [`OrgInterface`], so the
//! same CPU runs inside the live world, the test CPU, or a unit test.

use crate::hardware::context::AvidaContext;
use crate::hardware::fault::Fault;
use crate::hardware::genome::Genome;
use crate::hardware::merit::Merit;
use crate::hardware::mutation::MutationLog;
use crate::hardware::thread::IoBuffer;

/// Everything produced by a successful divide.
#[derive(Clone, Debug, PartialEq)]
pub struct Offspring {
    pub genome: Genome,
    pub merit: Merit,
    pub mutations: MutationLog,
    /// Parent sites flagged copied inside the offspring region.
    pub copied_size: usize,
    /// Parent sites flagged executed.
    pub executed_size: usize,
    /// Length of the genome the parent was born with.
    pub parent_genome_size: usize,
}

pub trait OrgInterface {
    /// Next value for an `IO` instruction.
    fn next_input(&mut self, ctx: &mut AvidaContext) -> i32;

    /// Receives an output together with the thread's recent inputs.
    fn output(&mut self, ctx: &mut AvidaContext, value: i32, inputs: &IoBuffer);

    /// Task bonus accumulated this gestation; multiplies offspring merit.
    fn bonus(&self) -> f64;

    fn fault(&mut self, fault: Fault);

    /// Takes the offspring. Returns false if the parent did not survive the
    /// birth, in which case the hardware skips its post-divide reset.
    fn divide(&mut self, ctx: &mut AvidaContext, offspring: Offspring) -> bool;
}

#[cfg(test)]
pub mod tests {
    use super::*;

    /// Records everything the hardware reports.
    pub struct TestInterface {
        pub inputs: Vec<i32>,
        next_input: usize,
        pub outputs: Vec<i32>,
        pub faults: Vec<Fault>,
        pub offspring: Vec<Offspring>,
        pub bonus: f64,
        pub parent_survives: bool,
    }

    impl Default for TestInterface {
        fn default() -> Self {
            Self {
                inputs: vec![0x0f13149f, 0x3308e53e, 0x556241eb],
                next_input: 0,
                outputs: Vec::new(),
                faults: Vec::new(),
                offspring: Vec::new(),
                bonus: 1.0,
                parent_survives: true,
            }
        }
    }

    impl TestInterface {
        pub fn new() -> Self {
            Self::default()
        }
    }

    impl OrgInterface for TestInterface {
        fn next_input(&mut self, _ctx: &mut AvidaContext) -> i32 {
            let value = self.inputs[self.next_input % self.inputs.len()];
            self.next_input += 1;
            value
        }

        fn output(&mut self, _ctx: &mut AvidaContext, value: i32, _inputs: &IoBuffer) {
            self.outputs.push(value);
        }

        fn bonus(&self) -> f64 {
            self.bonus
        }

        fn fault(&mut self, fault: Fault) {
            self.faults.push(fault);
        }

        fn divide(&mut self, _ctx: &mut AvidaContext, offspring: Offspring) -> bool {
            self.offspring.push(offspring);
            self.parent_survives
        }
    }
}
