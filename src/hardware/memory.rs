//! Working memory an organism executes and rewrites.
//!
//! Every site is one [`Site`] record (instruction, protected bit, flags), so
//! the instruction stream and its metadata can never fall out of step.
//!
//! The backing store grows in large steps and shrinks only when it is mostly
//! empty, so the constant one-site edits made by `h-copy` and the mutation
//! operators do not reallocate on every call. Sites between the active size
//! and the backing length keep whatever they last held; [`CpuMemory::resize_old`]
//! exposes that stale content for necrophilic allocation.

use crate::hardware::errors::HardwareError;
use crate::hardware::genome::Genome;
use crate::hardware::isa::{Instruction, InstructionSet};
use avida_derive::BinaryCodec;
use std::ops::Range;

/// Per-site metadata bits.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, BinaryCodec)]
pub struct SiteFlags(pub u8);

impl SiteFlags {
    pub const COPIED: u8 = 1 << 0;
    pub const MUTATED: u8 = 1 << 1;
    pub const EXECUTED: u8 = 1 << 2;
    pub const BREAKPOINT: u8 = 1 << 3;
    pub const POINT_MUT: u8 = 1 << 4;
    pub const COPY_MUT: u8 = 1 << 5;
    pub const INJECTED: u8 = 1 << 6;

    #[inline]
    pub fn contains(self, bit: u8) -> bool {
        self.0 & bit != 0
    }

    #[inline]
    pub fn insert(&mut self, bit: u8) {
        self.0 |= bit;
    }

    #[inline]
    pub fn remove(&mut self, bit: u8) {
        self.0 &= !bit;
    }

    pub fn clear(&mut self) {
        self.0 = 0;
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, BinaryCodec)]
pub struct Site {
    pub inst: Instruction,
    /// Survives [`CpuMemory::remove`].
    pub protected: bool,
    pub flags: SiteFlags,
}

impl Site {
    pub fn new(inst: Instruction) -> Self {
        Self {
            inst,
            protected: false,
            flags: SiteFlags::default(),
        }
    }
}

const GROWTH_MIN: usize = 10;

#[derive(Clone, Debug, PartialEq, Eq, BinaryCodec)]
pub struct CpuMemory {
    /// Backing store; `sites[..active]` is the live memory.
    sites: Vec<Site>,
    active: usize,
    max_size: usize,
    /// Number of times the backing store changed length.
    reallocations: u64,
}

impl CpuMemory {
    pub fn new(max_size: usize) -> Self {
        Self {
            sites: Vec::new(),
            active: 0,
            max_size,
            reallocations: 0,
        }
    }

    pub fn from_genome(genome: &Genome, max_size: usize) -> Result<Self, HardwareError> {
        let mut memory = Self::new(max_size);
        memory.load(genome)?;
        Ok(memory)
    }

    pub fn from_symbols(
        text: &str,
        set: &InstructionSet,
        max_size: usize,
    ) -> Result<Self, HardwareError> {
        Self::from_genome(&Genome::from_symbols(text, set)?, max_size)
    }

    /// Replaces the whole content with `genome`, clearing all flags and
    /// protection.
    pub fn load(&mut self, genome: &Genome) -> Result<(), HardwareError> {
        self.check_size(genome.len())?;
        self.sloppy_resize(genome.len());
        for (site, inst) in self.sites.iter_mut().zip(genome.instructions()) {
            *site = Site::new(*inst);
        }
        Ok(())
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.active
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.active == 0
    }

    pub fn max_size(&self) -> usize {
        self.max_size
    }

    /// Length of the backing store.
    pub fn capacity(&self) -> usize {
        self.sites.len()
    }

    pub fn reallocations(&self) -> u64 {
        self.reallocations
    }

    pub fn sites(&self) -> &[Site] {
        &self.sites[..self.active]
    }

    pub fn instructions(&self) -> impl Iterator<Item = Instruction> + '_ {
        self.sites().iter().map(|s| s.inst)
    }

    fn check_index(&self, pos: usize) -> Result<(), HardwareError> {
        if pos >= self.active {
            return Err(HardwareError::IndexOutOfRange {
                index: pos,
                size: self.active,
            });
        }
        Ok(())
    }

    fn check_size(&self, requested: usize) -> Result<(), HardwareError> {
        if requested > self.max_size {
            return Err(HardwareError::SizeExceeded {
                requested,
                max: self.max_size,
            });
        }
        Ok(())
    }

    #[inline]
    pub fn get(&self, pos: usize) -> Result<Instruction, HardwareError> {
        self.check_index(pos)?;
        Ok(self.sites[pos].inst)
    }

    pub fn site(&self, pos: usize) -> Result<&Site, HardwareError> {
        self.check_index(pos)?;
        Ok(&self.sites[pos])
    }

    /// Overwrites one instruction; flags and protection are kept.
    pub fn set(&mut self, pos: usize, inst: Instruction) -> Result<(), HardwareError> {
        self.check_index(pos)?;
        self.sites[pos].inst = inst;
        Ok(())
    }

    pub fn flags(&self, pos: usize) -> Result<SiteFlags, HardwareError> {
        Ok(self.site(pos)?.flags)
    }

    pub fn set_flag(&mut self, pos: usize, bit: u8) -> Result<(), HardwareError> {
        self.check_index(pos)?;
        self.sites[pos].flags.insert(bit);
        Ok(())
    }

    pub fn clear_flag(&mut self, pos: usize, bit: u8) -> Result<(), HardwareError> {
        self.check_index(pos)?;
        self.sites[pos].flags.remove(bit);
        Ok(())
    }

    pub fn has_flag(&self, pos: usize, bit: u8) -> bool {
        pos < self.active && self.sites[pos].flags.contains(bit)
    }

    pub fn set_protected(&mut self, pos: usize, protected: bool) -> Result<(), HardwareError> {
        self.check_index(pos)?;
        self.sites[pos].protected = protected;
        Ok(())
    }

    pub fn is_protected(&self, pos: usize) -> bool {
        pos < self.active && self.sites[pos].protected
    }

    pub fn clear_flags(&mut self) {
        for site in &mut self.sites[..self.active] {
            site.flags.clear();
        }
    }

    /// Number of sites in `range` (clamped to memory) carrying `bit`.
    pub fn count_flag(&self, range: Range<usize>, bit: u8) -> usize {
        let end = range.end.min(self.active);
        let start = range.start.min(end);
        self.sites[start..end]
            .iter()
            .filter(|s| s.flags.contains(bit))
            .count()
    }

    pub fn copied_count(&self, range: Range<usize>) -> usize {
        self.count_flag(range, SiteFlags::COPIED)
    }

    pub fn executed_count(&self, range: Range<usize>) -> usize {
        self.count_flag(range, SiteFlags::EXECUTED)
    }

    /// Adjusts the backing store for `new_size` live sites and sets the
    /// active size. Content beyond the old active size is left as it was.
    fn sloppy_resize(&mut self, new_size: usize) {
        let cap = self.sites.len();
        if new_size > cap {
            let grown = new_size.max(cap + cap / 2).max(cap + GROWTH_MIN);
            self.sites.resize(grown, Site::default());
            self.reallocations += 1;
        } else if new_size * 4 < cap {
            let shrunk = (new_size + new_size / 2).max(1);
            self.sites.truncate(shrunk);
            self.sites.shrink_to_fit();
            self.reallocations += 1;
        }
        self.active = new_size;
    }

    /// Sets the size; new sites hold the default instruction with cleared
    /// flags, and shrinking drops trailing sites whether or not they are
    /// protected.
    pub fn resize(&mut self, new_size: usize) -> Result<(), HardwareError> {
        self.check_size(new_size)?;
        let old = self.active;
        self.sloppy_resize(new_size);
        if new_size > old {
            for site in &mut self.sites[old..new_size] {
                *site = Site::default();
            }
        }
        Ok(())
    }

    /// Like [`resize`](Self::resize) but grown sites keep whatever the backing
    /// store last held there. Only flags and protection are cleared.
    pub fn resize_old(&mut self, new_size: usize) -> Result<(), HardwareError> {
        self.check_size(new_size)?;
        let old = self.active;
        self.sloppy_resize(new_size);
        if new_size > old {
            for site in &mut self.sites[old..new_size] {
                site.flags.clear();
                site.protected = false;
            }
        }
        Ok(())
    }

    pub fn insert(&mut self, pos: usize, inst: Instruction) -> Result<(), HardwareError> {
        self.insert_slice(pos, &[inst])
    }

    pub fn insert_genome(&mut self, pos: usize, genome: &Genome) -> Result<(), HardwareError> {
        self.insert_slice(pos, genome.instructions())
    }

    /// Shifts `[pos, len)` right and writes `insts` at `pos` as fresh,
    /// unprotected sites.
    pub fn insert_slice(&mut self, pos: usize, insts: &[Instruction]) -> Result<(), HardwareError> {
        if pos > self.active {
            return Err(HardwareError::IndexOutOfRange {
                index: pos,
                size: self.active,
            });
        }
        let old = self.active;
        let count = insts.len();
        self.check_size(old + count)?;
        self.sloppy_resize(old + count);
        self.sites.copy_within(pos..old, pos + count);
        for (site, inst) in self.sites[pos..pos + count].iter_mut().zip(insts) {
            *site = Site::new(*inst);
        }
        Ok(())
    }

    /// Removes `count` unprotected sites starting at `pos`.
    ///
    /// Protected sites met along the way stay in place and the window widens
    /// past them, so more than `count` positions may be spanned. If memory
    /// ends first, fewer than `count` sites are removed. Returns the span
    /// actually covered.
    pub fn remove(&mut self, pos: usize, count: usize) -> Result<usize, HardwareError> {
        if count == 0 {
            return Ok(0);
        }
        self.check_index(pos)?;

        let old = self.active;
        let mut kept = Vec::new();
        let mut removed = 0;
        let mut end = pos;
        while end < old && removed < count {
            let site = self.sites[end];
            if site.protected {
                kept.push(site);
            } else {
                removed += 1;
            }
            end += 1;
        }

        let kept_len = kept.len();
        self.sites[pos..pos + kept_len].copy_from_slice(&kept);
        self.sites.copy_within(end..old, pos + kept_len);
        self.sloppy_resize(old - removed);
        Ok(end - pos)
    }

    /// Replaces the `count` sites at `pos` with `insts`, inserting or
    /// removing first so the lengths match. Replaced sites get cleared flags;
    /// protection stays with the position.
    pub fn replace(
        &mut self,
        pos: usize,
        count: usize,
        insts: &[Instruction],
    ) -> Result<(), HardwareError> {
        if pos + count > self.active {
            return Err(HardwareError::IndexOutOfRange {
                index: pos + count,
                size: self.active,
            });
        }
        let new_len = insts.len();
        if new_len > count {
            let filler = vec![Instruction::default(); new_len - count];
            self.insert_slice(pos + count, &filler)?;
        } else if new_len < count {
            self.remove(pos + new_len, count - new_len)?;
        }
        let end = (pos + new_len).min(self.active);
        for (site, inst) in self.sites[pos..end].iter_mut().zip(insts) {
            site.inst = *inst;
            site.flags.clear();
        }
        Ok(())
    }

    /// Duplicates instruction, protection and flags from `from` to `to`.
    pub fn copy_site(&mut self, to: usize, from: usize) -> Result<(), HardwareError> {
        self.check_index(to)?;
        self.check_index(from)?;
        self.sites[to] = self.sites[from];
        Ok(())
    }

    /// The instructions in `range` as a new genome.
    pub fn crop(&self, range: Range<usize>) -> Result<Genome, HardwareError> {
        if range.end > self.active || range.start > range.end {
            return Err(HardwareError::IndexOutOfRange {
                index: range.end,
                size: self.active,
            });
        }
        if range.is_empty() {
            return Err(HardwareError::EmptyGenome);
        }
        Ok(Genome::from_valid(
            self.sites[range].iter().map(|s| s.inst).collect(),
        ))
    }

    pub fn as_genome(&self) -> Result<Genome, HardwareError> {
        self.crop(0..self.active)
    }

    pub fn to_symbols(&self, set: &InstructionSet) -> String {
        self.instructions().map(|inst| set.symbol(inst)).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hardware::isa::HardwareKind;

    fn set() -> InstructionSet {
        InstructionSet::default_for(HardwareKind::Heads)
    }

    fn memory(text: &str) -> CpuMemory {
        CpuMemory::from_symbols(text, &set(), 64).unwrap()
    }

    #[test]
    fn string_round_trip() {
        let set = set();
        let text = "rucavcccutycasvab";
        let mem = CpuMemory::from_symbols(text, &set, 64).unwrap();
        assert_eq!(mem.to_symbols(&set), text);
        let again = CpuMemory::from_symbols(&mem.to_symbols(&set), &set, 64).unwrap();
        assert_eq!(again.to_symbols(&set), text);
    }

    #[test]
    fn resize_twice_does_not_reallocate() {
        let mut mem = memory("abc");
        mem.resize(40).unwrap();
        let reallocations = mem.reallocations();
        let capacity = mem.capacity();
        mem.resize(40).unwrap();
        assert_eq!(mem.reallocations(), reallocations);
        assert_eq!(mem.capacity(), capacity);
    }

    #[test]
    fn small_edits_are_amortized() {
        let mut mem = memory("abc");
        let before = mem.reallocations();
        for i in 0..30 {
            mem.insert(mem.len(), Instruction((i % 3) as u8)).unwrap();
        }
        // 10 -> 20 -> 30 -> 45
        assert_eq!(mem.reallocations() - before, 3);
        assert_eq!(mem.capacity(), 45);
        mem.resize(3).unwrap();
        assert_eq!(mem.capacity(), 4);
    }

    #[test]
    fn resize_clears_new_sites() {
        let mut mem = memory("zzz");
        mem.set_flag(2, SiteFlags::COPIED).unwrap();
        mem.resize(2).unwrap();
        mem.resize(4).unwrap();
        assert_eq!(mem.get(2).unwrap(), Instruction(0));
        assert_eq!(mem.flags(2).unwrap(), SiteFlags::default());
    }

    #[test]
    fn resize_old_keeps_stale_content() {
        let mut mem = memory("zzzzzzzz");
        mem.set_flag(7, SiteFlags::EXECUTED).unwrap();
        mem.resize(6).unwrap();
        mem.resize_old(8).unwrap();
        assert_eq!(mem.get(7).unwrap(), Instruction(25));
        assert!(!mem.has_flag(7, SiteFlags::EXECUTED));
    }

    #[test]
    fn resize_past_max_is_rejected() {
        let mut mem = memory("abc");
        assert_eq!(
            mem.resize(65).unwrap_err(),
            HardwareError::SizeExceeded {
                requested: 65,
                max: 64
            }
        );
        assert_eq!(mem.len(), 3);
    }

    #[test]
    fn insert_shifts_tail() {
        let set = set();
        let mut mem = memory("abc");
        mem.insert(1, Instruction(25)).unwrap();
        assert_eq!(mem.to_symbols(&set), "azbc");
        let genome = Genome::from_symbols("xy", &set).unwrap();
        mem.insert_genome(4, &genome).unwrap();
        assert_eq!(mem.to_symbols(&set), "azbcxy");
        assert!(mem.insert(7, Instruction(0)).is_err());
    }

    #[test]
    fn remove_without_protection_is_exact() {
        let set = set();
        let mut mem = memory("abcdef");
        assert_eq!(mem.remove(1, 2).unwrap(), 2);
        assert_eq!(mem.to_symbols(&set), "adef");
    }

    #[test]
    fn remove_widens_around_protected_sites() {
        let set = set();
        let mut mem = memory("abcdef");
        mem.set_protected(2, true).unwrap();
        // removes b and d, keeps c in place
        assert_eq!(mem.remove(1, 2).unwrap(), 3);
        assert_eq!(mem.to_symbols(&set), "acef");
        assert!(mem.is_protected(1));
        assert_eq!(mem.len(), 4);
    }

    #[test]
    fn remove_stops_at_end_of_memory() {
        let set = set();
        let mut mem = memory("abcd");
        mem.set_protected(3, true).unwrap();
        assert_eq!(mem.remove(2, 5).unwrap(), 2);
        assert_eq!(mem.to_symbols(&set), "abd");
        assert!(mem.remove(3, 1).is_err());
    }

    #[test]
    fn protected_sites_survive_edit_sequences() {
        let set = set();
        let mut mem = memory("abcdefghij");
        mem.set_protected(4, true).unwrap();
        mem.set_protected(7, true).unwrap();

        mem.remove(0, 6).unwrap();
        mem.insert(0, Instruction(25)).unwrap();
        let filler = [Instruction(24); 3];
        mem.replace(0, 1, &filler).unwrap();
        mem.remove(3, 3).unwrap();

        let protected: Vec<char> = mem
            .sites()
            .iter()
            .filter(|s| s.protected)
            .map(|s| set.symbol(s.inst))
            .collect();
        assert_eq!(protected, vec!['e', 'h']);
    }

    #[test]
    fn replace_reconciles_length() {
        let set = set();
        let mut mem = memory("abcdef");
        mem.replace(1, 2, &[Instruction(25); 4]).unwrap();
        assert_eq!(mem.to_symbols(&set), "azzzzdef");
        mem.replace(1, 4, &[Instruction(24)]).unwrap();
        assert_eq!(mem.to_symbols(&set), "aydef");
        assert!(mem.replace(4, 2, &[]).is_err());
    }

    #[test]
    fn copy_site_moves_metadata() {
        let mut mem = memory("abc");
        mem.set_protected(0, true).unwrap();
        mem.set_flag(0, SiteFlags::EXECUTED).unwrap();
        mem.copy_site(2, 0).unwrap();
        assert_eq!(mem.site(2).unwrap(), mem.site(0).unwrap());
        assert!(mem.copy_site(3, 0).is_err());
    }

    #[test]
    fn out_of_range_reads_fail_fast() {
        let mem = memory("abc");
        assert_eq!(
            mem.get(3).unwrap_err(),
            HardwareError::IndexOutOfRange { index: 3, size: 3 }
        );
        assert!(mem.crop(2..4).is_err());
    }

    #[test]
    fn flag_counts_clamp_range() {
        let mut mem = memory("abcde");
        mem.set_flag(1, SiteFlags::COPIED).unwrap();
        mem.set_flag(4, SiteFlags::COPIED).unwrap();
        mem.set_flag(4, SiteFlags::EXECUTED).unwrap();
        assert_eq!(mem.copied_count(0..100), 2);
        assert_eq!(mem.copied_count(2..5), 1);
        assert_eq!(mem.executed_count(0..5), 1);
        mem.clear_flags();
        assert_eq!(mem.copied_count(0..5), 0);
    }

    #[test]
    fn crop_produces_genome() {
        let set = set();
        let mem = memory("rucav");
        assert_eq!(mem.crop(1..3).unwrap().to_symbols(&set), "uc");
        assert_eq!(mem.as_genome().unwrap().to_symbols(&set), "rucav");
    }
}
