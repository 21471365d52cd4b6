use crate::types::encoding::DecodeError;
use avida_derive::Error;

/// Errors raised by genome construction, memory editing, configuration and
/// checkpoint decoding.
///
/// Runtime misbehaviour of an organism is never an error: instruction handlers
/// report [`Fault`](super::fault::Fault)s and carry on.
#[derive(Debug, Error, PartialEq)]
pub enum HardwareError {
    /// Memory index outside `[0, size)` (or `[0, size]` for insertions).
    #[error("index {index} out of range for memory of size {size}")]
    IndexOutOfRange { index: usize, size: usize },
    /// Genomes must hold at least one instruction.
    #[error("genome must contain at least one instruction")]
    EmptyGenome,
    /// The edit would grow memory past the configured maximum.
    #[error("memory size {requested} exceeds the maximum of {max}")]
    SizeExceeded { requested: usize, max: usize },
    /// Opcode not defined by the instruction set.
    #[error("unknown instruction id {id} (instruction set has {size})")]
    UnknownInstruction { id: u8, size: usize },
    /// Character with no instruction in the genome text form.
    #[error("unknown instruction symbol '{0}'")]
    UnknownSymbol(char),
    /// Name not present in the hardware's instruction library.
    #[error("unknown instruction '{name}' for {hardware} hardware")]
    UnknownInstructionName { name: String, hardware: &'static str },
    /// Instruction sets are limited by the one-character symbol alphabet.
    #[error("instruction set cannot hold more than {max} instructions")]
    TooManyInstructions { max: usize },
    /// Configuration or instruction-set file problem.
    #[error("line {line}: {reason}")]
    Config { line: usize, reason: String },
    /// File could not be read.
    #[error("io error: {0}")]
    Io(String),
    /// Checkpoint bytes could not be decoded.
    #[error("decoding error: {reason}")]
    Decode { reason: String },
    /// Checkpoint taken from a different hardware flavor.
    #[error("snapshot is not for {expected} hardware")]
    SnapshotMismatch { expected: &'static str },
}

impl From<DecodeError> for HardwareError {
    fn from(err: DecodeError) -> Self {
        HardwareError::Decode {
            reason: err.to_string(),
        }
    }
}

impl From<std::io::Error> for HardwareError {
    fn from(err: std::io::Error) -> Self {
        HardwareError::Io(err.to_string())
    }
}
