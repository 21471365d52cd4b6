use crate::hardware::head::{Head, HeadKind, NUM_HEADS};
use crate::hardware::label::CodeLabel;
use crate::hardware::stack::CpuStack;
use avida_derive::BinaryCodec;

pub const IO_BUFFER_SIZE: usize = 3;

/// Most recent values first seen by a thread, oldest dropped first.
#[derive(Clone, Debug, Default, PartialEq, Eq, BinaryCodec)]
pub struct IoBuffer {
    values: Vec<i32>,
}

impl IoBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, value: i32) {
        if self.values.len() == IO_BUFFER_SIZE {
            self.values.remove(0);
        }
        self.values.push(value);
    }

    /// `get(0)` is the newest value.
    pub fn get(&self, age: usize) -> Option<i32> {
        self.values.iter().rev().nth(age).copied()
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

    /// Oldest first.
    pub fn values(&self) -> &[i32] {
        &self.values
    }
}

/// One instruction-pointer context inside an organism.
#[derive(Clone, Debug, PartialEq, Eq, BinaryCodec)]
pub struct ExecutionThread {
    pub id: u32,
    pub heads: [Head; NUM_HEADS],
    pub registers: Vec<i32>,
    pub stacks: Vec<CpuStack>,
    /// Active stack index; `stacks.len()` selects the global stack.
    pub cur_stack: usize,
    pub cur_head: usize,
    pub read_label: CodeLabel,
    pub next_label: CodeLabel,
    pub input_buf: IoBuffer,
    pub output_buf: IoBuffer,
}

impl ExecutionThread {
    pub fn new(id: u32, num_registers: usize, num_stacks: usize) -> Self {
        Self {
            id,
            heads: [Head::default(); NUM_HEADS],
            registers: vec![0; num_registers],
            stacks: vec![CpuStack::new(); num_stacks],
            cur_stack: 0,
            cur_head: HeadKind::Ip as usize,
            read_label: CodeLabel::new(),
            next_label: CodeLabel::new(),
            input_buf: IoBuffer::new(),
            output_buf: IoBuffer::new(),
        }
    }

    /// Back to the birth state, keeping the id and shape.
    pub fn reset(&mut self) {
        let id = self.id;
        *self = Self::new(id, self.registers.len(), self.stacks.len());
    }

    #[inline]
    pub fn head(&self, kind: HeadKind) -> &Head {
        &self.heads[kind as usize]
    }

    #[inline]
    pub fn head_mut(&mut self, kind: HeadKind) -> &mut Head {
        &mut self.heads[kind as usize]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn io_buffer_keeps_newest() {
        let mut buf = IoBuffer::new();
        for v in 1..=5 {
            buf.add(v);
        }
        assert_eq!(buf.values(), &[3, 4, 5]);
        assert_eq!(buf.get(0), Some(5));
        assert_eq!(buf.get(2), Some(3));
        assert_eq!(buf.get(3), None);
    }

    #[test]
    fn reset_keeps_shape() {
        let mut thread = ExecutionThread::new(3, 3, 1);
        thread.registers[1] = 9;
        thread.stacks[0].push(4);
        thread.head_mut(HeadKind::Flow).set(5, 10);
        thread.read_label.add_nop(2);
        thread.reset();
        assert_eq!(thread, ExecutionThread::new(3, 3, 1));
    }
}
