//! SHA3-256 digests used to identify genotypes.

use crate::types::encoding::EncodeSink;
use avida_derive::BinaryCodec;
use sha3::{Digest, Sha3_256};
use std::fmt;

pub const HASH_LEN: usize = 32;

/// Fixed-size digest of an encoded value.
///
/// Two genomes with equal instruction sequences always hash equal, so the
/// digest stands in for genotype identity wherever a full comparison would
/// be wasteful (world statistics, true-breeding checks).
#[derive(Clone, Copy, Debug, PartialEq, Eq, BinaryCodec, Default, Hash, Ord, PartialOrd)]
pub struct Hash(pub [u8; HASH_LEN]);

impl Hash {
    pub const fn zero() -> Hash {
        Hash([0u8; HASH_LEN])
    }

    pub fn as_slice(&self) -> &[u8] {
        &self.0
    }

    pub fn sha3() -> HashBuilder {
        HashBuilder::new()
    }

    /// First eight hex digits, for log lines.
    pub fn short(&self) -> String {
        self.0[..4].iter().map(|b| format!("{:02x}", b)).collect()
    }
}

impl fmt::Display for Hash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for byte in &self.0 {
            write!(f, "{:02x}", byte)?;
        }
        Ok(())
    }
}

/// Incremental SHA3-256 builder; doubles as an [`EncodeSink`] so encodable
/// values hash without an intermediate buffer.
pub struct HashBuilder {
    hasher: Sha3_256,
}

impl Default for HashBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl HashBuilder {
    pub fn new() -> Self {
        Self {
            hasher: Sha3_256::new(),
        }
    }

    pub fn update(&mut self, data: &[u8]) {
        self.hasher.update(data);
    }

    pub fn finalize(self) -> Hash {
        Hash(self.hasher.finalize().into())
    }
}

impl EncodeSink for HashBuilder {
    fn write(&mut self, bytes: &[u8]) {
        self.hasher.update(bytes);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::encoding::Encode;

    #[test]
    fn sink_matches_direct_update() {
        let data: Vec<u8> = vec![0, 1, 2, 25];

        let mut via_sink = Hash::sha3();
        data.encode(&mut via_sink);

        let mut direct = Hash::sha3();
        direct.update(&data.to_bytes());

        assert_eq!(via_sink.finalize(), direct.finalize());
    }

    #[test]
    fn short_form_is_prefix_of_display() {
        let mut h = Hash::sha3();
        h.update(b"rucav");
        let hash = h.finalize();
        assert_eq!(hash.short().len(), 8);
        assert!(hash.to_string().starts_with(&hash.short()));
    }
}
