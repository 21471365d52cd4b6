//! Nop labels and the sub-label search used by jumps and `h-search`.

use crate::hardware::isa::InstructionSet;
use crate::hardware::memory::CpuMemory;
use avida_derive::BinaryCodec;

pub const MAX_LABEL_SIZE: usize = 10;

/// Short run of nop modifiers read from the genome.
#[derive(Clone, Debug, Default, PartialEq, Eq, BinaryCodec)]
pub struct CodeLabel {
    nops: Vec<u8>,
}

impl CodeLabel {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_nops(nops: &[u8]) -> Self {
        let mut label = Self::new();
        for &nop in nops {
            label.add_nop(nop);
        }
        label
    }

    /// Appends a nop; labels stop growing at [`MAX_LABEL_SIZE`].
    pub fn add_nop(&mut self, nop: u8) {
        if self.nops.len() < MAX_LABEL_SIZE {
            self.nops.push(nop);
        }
    }

    pub fn clear(&mut self) {
        self.nops.clear();
    }

    pub fn len(&self) -> usize {
        self.nops.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nops.is_empty()
    }

    pub fn nops(&self) -> &[u8] {
        &self.nops
    }

    pub fn get(&self, i: usize) -> Option<u8> {
        self.nops.get(i).copied()
    }

    /// Adds `by` to every nop modulo `base`. `rotate(1, 3)` is the heads
    /// complement (A->B->C->A); `rotate(2, 4)` the four-stack one.
    pub fn rotate(&mut self, by: u8, base: u8) {
        for nop in &mut self.nops {
            *nop = (*nop + by) % base;
        }
    }

    pub fn rotated(&self, by: u8, base: u8) -> CodeLabel {
        let mut out = self.clone();
        out.rotate(by, base);
        out
    }

    /// The label read as a base-`base` number, first nop most significant.
    pub fn as_int(&self, base: u32) -> i32 {
        self.nops
            .iter()
            .fold(0i32, |acc, &nop| acc.wrapping_mul(base as i32).wrapping_add(nop as i32))
    }
}

fn nop_at(memory: &CpuMemory, set: &InstructionSet, pos: usize) -> Option<u8> {
    memory.get(pos).ok().and_then(|inst| set.nop_mod(inst))
}

/// Tests every alignment of `label` inside the nop run `[start, end)`.
fn run_contains(
    label: &CodeLabel,
    memory: &CpuMemory,
    set: &InstructionSet,
    start: usize,
    end: usize,
) -> Option<usize> {
    let size = label.len();
    if end - start < size {
        return None;
    }
    (start..=end - size).find(|&offset| {
        label
            .nops()
            .iter()
            .enumerate()
            .all(|(i, &nop)| nop_at(memory, set, offset + i) == Some(nop))
    })
}

/// Searches forward from `origin` for a nop run containing `label`.
///
/// The first `label.len()` positions after `origin` are skipped (the label
/// being searched for is usually sitting there). Returns the position just
/// past the matched label, or `None` when memory ends first.
pub fn find_label_forward(
    label: &CodeLabel,
    memory: &CpuMemory,
    set: &InstructionSet,
    origin: usize,
) -> Option<usize> {
    let size = label.len();
    if size == 0 {
        return None;
    }
    let len = memory.len();
    let mut pos = origin + size;
    while pos < len {
        if nop_at(memory, set, pos).is_some() {
            let mut start = pos;
            let mut end = pos + 1;
            while start > origin && nop_at(memory, set, start - 1).is_some() {
                start -= 1;
            }
            while end < len && nop_at(memory, set, end).is_some() {
                end += 1;
            }
            if let Some(offset) = run_contains(label, memory, set, start, end) {
                return Some(offset + size);
            }
            pos = end;
        }
        pos += size;
    }
    None
}

/// Searches backward from `origin` for a nop run containing `label`.
///
/// Returns the end of the matching run (never past `origin`), or `None` when
/// the start of memory is reached.
pub fn find_label_backward(
    label: &CodeLabel,
    memory: &CpuMemory,
    set: &InstructionSet,
    origin: isize,
) -> Option<usize> {
    let size = label.len() as isize;
    if size == 0 {
        return None;
    }
    let bound = origin.max(0) as usize;
    let mut pos = origin - size;
    while pos >= 0 {
        let p = pos as usize;
        if nop_at(memory, set, p).is_some() {
            let mut start = p;
            let mut end = p + 1;
            while start > 0 && nop_at(memory, set, start - 1).is_some() {
                start -= 1;
            }
            while end < bound && nop_at(memory, set, end).is_some() {
                end += 1;
            }
            if run_contains(label, memory, set, start, end).is_some() {
                return Some(end);
            }
            pos = start as isize - 1;
        }
        pos -= size;
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hardware::isa::HardwareKind;

    fn heads() -> InstructionSet {
        InstructionSet::default_for(HardwareKind::Heads)
    }

    #[test]
    fn labels_cap_at_max_size() {
        let mut label = CodeLabel::new();
        for _ in 0..MAX_LABEL_SIZE + 3 {
            label.add_nop(1);
        }
        assert_eq!(label.len(), MAX_LABEL_SIZE);
    }

    #[test]
    fn rotate_wraps_modulo_base() {
        let label = CodeLabel::from_nops(&[0, 1, 2]);
        assert_eq!(label.rotated(1, 3).nops(), &[1, 2, 0]);
        let four = CodeLabel::from_nops(&[0, 1, 2, 3]);
        assert_eq!(four.rotated(2, 4).nops(), &[2, 3, 0, 1]);
        assert_eq!(four.rotated(2, 4).rotated(2, 4), four);
    }

    #[test]
    fn as_int_reads_base_n() {
        assert_eq!(CodeLabel::from_nops(&[1, 2]).as_int(3), 5);
        assert_eq!(CodeLabel::new().as_int(3), 0);
    }

    #[test]
    fn forward_finds_label_after_origin() {
        let set = heads();
        // u c a | c c c | a b
        let mem = CpuMemory::from_symbols("ucavvvvab", &set, 64).unwrap();
        let label = CodeLabel::from_nops(&[0, 1]);
        assert_eq!(find_label_forward(&label, &mem, &set, 0), Some(9));
    }

    #[test]
    fn forward_matches_inside_longer_runs() {
        let set = heads();
        let mem = CpuMemory::from_symbols("uccvvcabcv", &set, 64).unwrap();
        let label = CodeLabel::from_nops(&[0, 1]);
        assert_eq!(find_label_forward(&label, &mem, &set, 0), Some(8));
    }

    #[test]
    fn forward_not_found() {
        let set = heads();
        let mem = CpuMemory::from_symbols("uccvvvvcc", &set, 64).unwrap();
        let label = CodeLabel::from_nops(&[0, 1]);
        assert_eq!(find_label_forward(&label, &mem, &set, 0), None);
        assert_eq!(find_label_forward(&CodeLabel::new(), &mem, &set, 0), None);
    }

    #[test]
    fn backward_finds_run_end() {
        let set = heads();
        // run "ab" at 1..3, searching from the 'u' at 6 with label size 1
        let mem = CpuMemory::from_symbols("vabvvvuc", &set, 64).unwrap();
        let label = CodeLabel::from_nops(&[1]);
        assert_eq!(find_label_backward(&label, &mem, &set, 6 - 1), Some(3));
        assert_eq!(find_label_backward(&label, &mem, &set, 0), None);
    }
}
