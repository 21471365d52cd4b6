use avida_derive::BinaryCodec;

pub const STACK_DEPTH: usize = 10;

/// Bounded integer stack. Pushing onto a full stack drops the oldest value.
#[derive(Clone, Debug, Default, PartialEq, Eq, BinaryCodec)]
pub struct CpuStack {
    values: Vec<i32>,
}

impl CpuStack {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, value: i32) {
        if self.values.len() == STACK_DEPTH {
            self.values.remove(0);
        }
        self.values.push(value);
    }

    pub fn pop(&mut self) -> Option<i32> {
        self.values.pop()
    }

    pub fn top(&self) -> Option<i32> {
        self.values.last().copied()
    }

    /// Replaces the top value, or pushes when the stack is empty.
    pub fn set_top(&mut self, value: i32) {
        match self.values.last_mut() {
            Some(top) => *top = value,
            None => self.values.push(value),
        }
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn clear(&mut self) {
        self.values.clear();
    }

    /// Values from bottom to top.
    pub fn values(&self) -> &[i32] {
        &self.values
    }
}
