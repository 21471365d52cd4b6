//! The logic-9 environment: nine bitwise tasks an organism is rewarded for
//! computing over its inputs.

use crate::hardware::context::AvidaContext;
use crate::hardware::thread::IoBuffer;

/// Input patterns handed out when random inputs are off. Every combination
/// of three input bits occurs somewhere in these words.
pub const FIXED_INPUTS: [i32; 3] = [0x0f13149f, 0x3308e53e, 0x556241eb];

/// Boolean functions recognised by their truth table over the last three
/// inputs.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Task {
    Not,
    Nand,
    And,
    OrNot,
    Or,
    AndNot,
    Nor,
    Xor,
    Equ,
}

impl Task {
    pub const ALL: [Task; 9] = [
        Task::Not,
        Task::Nand,
        Task::And,
        Task::OrNot,
        Task::Or,
        Task::AndNot,
        Task::Nor,
        Task::Xor,
        Task::Equ,
    ];

    pub const fn name(&self) -> &'static str {
        match self {
            Task::Not => "not",
            Task::Nand => "nand",
            Task::And => "and",
            Task::OrNot => "orn",
            Task::Or => "or",
            Task::AndNot => "andn",
            Task::Nor => "nor",
            Task::Xor => "xor",
            Task::Equ => "equ",
        }
    }

    /// Truth-table ids that count as this task. Each id is one function of
    /// one, two or three of the inputs.
    pub const fn logic_ids(&self) -> &'static [u8] {
        match self {
            Task::Not => &[15, 51, 85],
            Task::Nand => &[63, 95, 119],
            Task::And => &[136, 160, 192],
            Task::OrNot => &[175, 187, 207, 221, 243, 245],
            Task::Or => &[238, 250, 252],
            Task::AndNot => &[10, 12, 34, 48, 68, 80],
            Task::Nor => &[3, 5, 17],
            Task::Xor => &[60, 90, 102],
            Task::Equ => &[153, 165, 195],
        }
    }

    /// Merit is multiplied by `2^exponent` the first time the task is
    /// performed in a gestation.
    pub const fn bonus_exponent(&self) -> i32 {
        match self {
            Task::Not | Task::Nand => 1,
            Task::And | Task::OrNot => 2,
            Task::Or | Task::AndNot => 3,
            Task::Nor | Task::Xor => 4,
            Task::Equ => 5,
        }
    }

    pub fn index(&self) -> usize {
        Task::ALL.iter().position(|t| t == self).unwrap_or(0)
    }
}

/// Truth-table id of `output` as a function of the three newest inputs.
///
/// Bit `i` of the id is the output for the input combination whose bits
/// (newest input in bit 0) spell `i`. Returns `None` if the output is not a
/// consistent function of the inputs, or if some combination never occurs.
pub fn logic_id(inputs: &IoBuffer, output: i32) -> Option<u8> {
    let num_inputs = inputs.len().min(3);
    let mut words = [0u32; 3];
    for (age, word) in words.iter_mut().enumerate().take(num_inputs) {
        *word = inputs.get(age).unwrap_or(0) as u32;
    }
    let out = output as u32;

    let mut table: [Option<bool>; 8] = [None; 8];
    for bit in 0..32 {
        let pos = (0..3).fold(0usize, |acc, i| acc | ((((words[i] >> bit) & 1) as usize) << i));
        let value = (out >> bit) & 1 == 1;
        match table[pos] {
            Some(seen) if seen != value => return None,
            _ => table[pos] = Some(value),
        }
    }

    // Missing inputs read as zero; their rows repeat the lower half.
    if num_inputs < 1 {
        table[1] = table[0];
    }
    if num_inputs < 2 {
        table[2] = table[0];
        table[3] = table[1];
    }
    if num_inputs < 3 {
        table.copy_within(0..4, 4);
    }

    let mut id = 0u8;
    for (i, row) in table.iter().enumerate() {
        if (*row)? {
            id |= 1 << i;
        }
    }
    Some(id)
}

#[derive(Clone, Debug, PartialEq)]
pub struct Environment {
    pub tasks: Vec<Task>,
    pub use_random_inputs: bool,
}

impl Default for Environment {
    fn default() -> Self {
        Self::logic9()
    }
}

impl Environment {
    pub fn logic9() -> Self {
        Self {
            tasks: Task::ALL.to_vec(),
            use_random_inputs: false,
        }
    }

    /// No rewarded tasks; merit comes from size alone.
    pub fn empty() -> Self {
        Self {
            tasks: Vec::new(),
            use_random_inputs: false,
        }
    }

    pub fn num_tasks(&self) -> usize {
        self.tasks.len()
    }

    /// Inputs for a newborn organism. Random patterns keep the top byte at
    /// `0x0f` so all bit combinations still appear.
    pub fn setup_inputs(&self, ctx: &mut AvidaContext) -> [i32; 3] {
        if !self.use_random_inputs {
            return FIXED_INPUTS;
        }
        let mut inputs = [0; 3];
        for input in inputs.iter_mut() {
            *input = ((15u32 << 24) | (ctx.random_u32() & 0x00ff_ffff)) as i32;
        }
        inputs
    }

    /// Indices into `tasks` of every task the output performs.
    pub fn check_output(&self, inputs: &IoBuffer, output: i32) -> Vec<usize> {
        let Some(id) = logic_id(inputs, output) else {
            return Vec::new();
        };
        self.tasks
            .iter()
            .enumerate()
            .filter(|(_, task)| task.logic_ids().contains(&id))
            .map(|(i, _)| i)
            .collect()
    }

    /// Bonus factor for performing task `index` for the first time this
    /// gestation.
    pub fn reward(&self, index: usize) -> f64 {
        self.tasks
            .get(index)
            .map(|task| 2f64.powi(task.bonus_exponent()))
            .unwrap_or(1.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn buffer(values: &[i32]) -> IoBuffer {
        let mut buf = IoBuffer::new();
        for v in values {
            buf.add(*v);
        }
        buf
    }

    #[test]
    fn fixed_inputs_identify_every_task() {
        let [a, b, c] = FIXED_INPUTS;
        // Oldest first; the newest input is bit 0 of the id.
        let inputs = buffer(&[c, b, a]);
        let env = Environment::logic9();
        let cases = [
            (!a, Task::Not),
            (!(a & b), Task::Nand),
            (a & b, Task::And),
            (a | !b, Task::OrNot),
            (a | b, Task::Or),
            (a & !b, Task::AndNot),
            (!(a | b), Task::Nor),
            (a ^ b, Task::Xor),
            (!(a ^ b), Task::Equ),
        ];
        for (output, task) in cases {
            assert_eq!(env.check_output(&inputs, output), vec![task.index()], "{}", task.name());
        }
    }

    #[test]
    fn echo_is_not_a_task() {
        let [a, b, c] = FIXED_INPUTS;
        let inputs = buffer(&[c, b, a]);
        assert_eq!(logic_id(&inputs, a), Some(170));
        assert!(Environment::logic9().check_output(&inputs, a).is_empty());
    }

    #[test]
    fn inconsistent_output_has_no_id() {
        let inputs = buffer(&[0, 0, 0]);
        assert_eq!(logic_id(&inputs, 0b10), None);
    }

    #[test]
    fn single_input_fills_the_table() {
        let a = FIXED_INPUTS[0];
        let inputs = buffer(&[a]);
        assert_eq!(logic_id(&inputs, !a), Some(85));
    }

    #[test]
    fn rewards_double_per_level() {
        let env = Environment::logic9();
        assert_eq!(env.reward(Task::Not.index()), 2.0);
        assert_eq!(env.reward(Task::Equ.index()), 32.0);
        assert_eq!(env.reward(99), 1.0);
    }

    #[test]
    fn random_inputs_keep_the_marker_byte() {
        let env = Environment {
            use_random_inputs: true,
            ..Environment::logic9()
        };
        let mut ctx = AvidaContext::new(11);
        for input in env.setup_inputs(&mut ctx) {
            assert_eq!((input as u32) >> 24, 15);
        }
    }
}
