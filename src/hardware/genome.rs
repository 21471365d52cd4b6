use crate::hardware::errors::HardwareError;
use crate::hardware::isa::{HardwareKind, Instruction, InstructionSet};
use crate::types::encoding::Encode;
use crate::types::hash::Hash;
use avida_derive::BinaryCodec;
use std::fmt;

/// Immutable instruction sequence, the heritable part of an organism.
///
/// A `Genome` is always non-empty and only holds opcodes defined by the
/// instruction set it was validated against.
#[derive(Clone, Debug, PartialEq, Eq, BinaryCodec)]
pub struct Genome {
    insts: Vec<Instruction>,
}

impl Genome {
    pub fn new(insts: Vec<Instruction>, set: &InstructionSet) -> Result<Self, HardwareError> {
        if insts.is_empty() {
            return Err(HardwareError::EmptyGenome);
        }
        if let Some(bad) = insts.iter().find(|inst| !set.contains(**inst)) {
            return Err(HardwareError::UnknownInstruction {
                id: bad.op(),
                size: set.size(),
            });
        }
        Ok(Self { insts })
    }

    /// Wraps instructions already known to be valid (cropped from memory).
    pub(crate) fn from_valid(insts: Vec<Instruction>) -> Self {
        Self { insts }
    }

    /// Parses the one-character-per-instruction text form.
    pub fn from_symbols(text: &str, set: &InstructionSet) -> Result<Self, HardwareError> {
        let insts = text
            .chars()
            .filter(|c| !c.is_whitespace())
            .map(|c| set.from_symbol(c).ok_or(HardwareError::UnknownSymbol(c)))
            .collect::<Result<Vec<_>, _>>()?;
        Self::new(insts, set)
    }

    /// Parses an organism listing: one instruction name per line, `#`
    /// comments and blank lines ignored.
    pub fn from_names(text: &str, set: &InstructionSet) -> Result<Self, HardwareError> {
        let mut insts = Vec::new();
        for (idx, raw) in text.lines().enumerate() {
            let name = raw.split('#').next().unwrap_or("").trim();
            if name.is_empty() {
                continue;
            }
            let inst = set.from_name(name).ok_or_else(|| HardwareError::Config {
                line: idx + 1,
                reason: format!("unknown instruction '{}'", name),
            })?;
            insts.push(inst);
        }
        Self::new(insts, set)
    }

    pub fn to_symbols(&self, set: &InstructionSet) -> String {
        self.insts.iter().map(|inst| set.symbol(*inst)).collect()
    }

    pub fn to_names(&self, set: &InstructionSet) -> String {
        let mut out = String::new();
        for inst in &self.insts {
            out.push_str(set.name(*inst));
            out.push('\n');
        }
        out
    }

    pub fn len(&self) -> usize {
        self.insts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.insts.is_empty()
    }

    pub fn get(&self, pos: usize) -> Option<Instruction> {
        self.insts.get(pos).copied()
    }

    pub fn instructions(&self) -> &[Instruction] {
        &self.insts
    }

    /// Copy of this genome with one site replaced.
    pub fn with_site(&self, pos: usize, inst: Instruction) -> Result<Genome, HardwareError> {
        if pos >= self.insts.len() {
            return Err(HardwareError::IndexOutOfRange {
                index: pos,
                size: self.insts.len(),
            });
        }
        let mut insts = self.insts.clone();
        insts[pos] = inst;
        Ok(Genome { insts })
    }

    /// The hand-written self-replicator for the set's hardware, spelled by
    /// instruction name so it survives any set that contains those names.
    pub fn ancestor(set: &InstructionSet) -> Result<Genome, HardwareError> {
        let names: Vec<&str> = match set.kind() {
            HardwareKind::Heads => {
                let mut names = vec!["h-alloc", "h-search", "nop-C", "nop-A", "mov-head"];
                names.extend(std::iter::repeat("nop-C").take(86));
                names.extend([
                    "h-search", "h-copy", "if-label", "nop-C", "nop-A", "h-divide", "mov-head",
                    "nop-A", "nop-B",
                ]);
                names
            }
            HardwareKind::FourStack => vec![
                "Alloc", "Search", "Nop-C", "Nop-A", "Head-Move", "Nop-C", "Search",
                "Head-Copy", "If-Label", "Nop-C", "Nop-A", "Divide", "Head-Move", "Nop-A",
                "Nop-C",
            ],
        };
        Self::from_names(&names.join("\n"), set)
    }

    pub fn digest(&self) -> Hash {
        let mut builder = Hash::sha3();
        self.insts.encode(&mut builder);
        builder.finalize()
    }
}

pub struct GenomeDisplay<'a> {
    genome: &'a Genome,
    set: &'a InstructionSet,
}

impl fmt::Display for GenomeDisplay<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.genome.to_symbols(self.set))
    }
}

impl Genome {
    pub fn display<'a>(&'a self, set: &'a InstructionSet) -> GenomeDisplay<'a> {
        GenomeDisplay { genome: self, set }
    }
}
