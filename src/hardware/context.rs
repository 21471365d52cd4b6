//! Per-run context threaded through every hardware call: the seeded random
//! source and the id allocator.

use avida_derive::BinaryCodec;
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;

/// Hands out monotonically increasing ids (organisms, genotypes).
#[derive(Clone, Debug, Default, PartialEq, Eq, BinaryCodec)]
pub struct IdAllocator {
    next: u64,
}

impl IdAllocator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn next_id(&mut self) -> u64 {
        let id = self.next;
        self.next += 1;
        id
    }

    pub fn peek(&self) -> u64 {
        self.next
    }
}

/// Random source plus id allocation for one simulation (or one test CPU run).
pub struct AvidaContext {
    rng: ChaCha8Rng,
    seed: u64,
    pub ids: IdAllocator,
}

impl AvidaContext {
    pub fn new(seed: u64) -> Self {
        Self {
            rng: ChaCha8Rng::seed_from_u64(seed),
            seed,
            ids: IdAllocator::new(),
        }
    }

    /// Seed 0 means "pick one from the clock", matching `RANDOM_SEED 0`.
    pub fn from_config_seed(seed: u64) -> Self {
        if seed != 0 {
            return Self::new(seed);
        }
        let nanos = std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .map(|d| d.as_nanos() as u64)
            .unwrap_or(1);
        Self::new(nanos | 1)
    }

    pub fn seed(&self) -> u64 {
        self.seed
    }

    pub fn rng(&mut self) -> &mut ChaCha8Rng {
        &mut self.rng
    }

    /// True with probability `p`; probabilities outside `(0, 1]` clamp.
    pub fn chance(&mut self, p: f64) -> bool {
        if !(p > 0.0) {
            return false;
        }
        if p >= 1.0 {
            return true;
        }
        self.rng.gen_bool(p)
    }

    /// Uniform index in `[0, n)`. `n` must be non-zero.
    pub fn random_index(&mut self, n: usize) -> usize {
        self.rng.gen_range(0..n)
    }

    pub fn random_f64(&mut self) -> f64 {
        self.rng.gen_range(0.0..1.0)
    }

    pub fn random_u32(&mut self) -> u32 {
        self.rng.gen_range(0..=u32::MAX)
    }

    /// Independent context for a parallel job. Stream `n` of the same seed,
    /// so results do not depend on how rayon schedules the jobs.
    pub fn derived(&self, stream: u64) -> AvidaContext {
        let mut rng = ChaCha8Rng::seed_from_u64(self.seed);
        rng.set_stream(stream.wrapping_add(1));
        AvidaContext {
            rng,
            seed: self.seed,
            ids: IdAllocator::new(),
        }
    }

    pub fn snapshot(&self) -> ContextSnapshot {
        ContextSnapshot {
            seed: self.rng.get_seed(),
            stream: self.rng.get_stream(),
            word_pos: self.rng.get_word_pos(),
            base_seed: self.seed,
            ids: self.ids.clone(),
        }
    }

    pub fn restore(snapshot: &ContextSnapshot) -> AvidaContext {
        let mut rng = ChaCha8Rng::from_seed(snapshot.seed);
        rng.set_stream(snapshot.stream);
        rng.set_word_pos(snapshot.word_pos);
        AvidaContext {
            rng,
            seed: snapshot.base_seed,
            ids: snapshot.ids.clone(),
        }
    }
}

/// Exact position of the random stream, enough to resume a run bit for bit.
#[derive(Clone, Debug, PartialEq, Eq, BinaryCodec)]
pub struct ContextSnapshot {
    pub seed: [u8; 32],
    pub stream: u64,
    pub word_pos: u128,
    pub base_seed: u64,
    pub ids: IdAllocator,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::encoding::{Decode, Encode};

    #[test]
    fn chance_clamps() {
        let mut ctx = AvidaContext::new(1);
        assert!(!ctx.chance(0.0));
        assert!(!ctx.chance(-1.0));
        assert!(!ctx.chance(f64::NAN));
        assert!(ctx.chance(1.0));
        assert!(ctx.chance(3.0));
    }

    #[test]
    fn same_seed_same_sequence() {
        let mut a = AvidaContext::new(42);
        let mut b = AvidaContext::new(42);
        for _ in 0..100 {
            assert_eq!(a.random_u32(), b.random_u32());
        }
    }

    #[test]
    fn derived_streams_differ_and_repeat() {
        let base = AvidaContext::new(9);
        let mut s1 = base.derived(1);
        let mut s2 = base.derived(2);
        let mut s1_again = base.derived(1);
        let a: Vec<u32> = (0..8).map(|_| s1.random_u32()).collect();
        let b: Vec<u32> = (0..8).map(|_| s2.random_u32()).collect();
        let c: Vec<u32> = (0..8).map(|_| s1_again.random_u32()).collect();
        assert_ne!(a, b);
        assert_eq!(a, c);
    }

    #[test]
    fn snapshot_resumes_stream() {
        let mut ctx = AvidaContext::new(5);
        for _ in 0..17 {
            ctx.random_u32();
        }
        ctx.ids.next_id();
        let bytes = ctx.snapshot().to_bytes();
        let expected: Vec<u32> = (0..10).map(|_| ctx.random_u32()).collect();

        let snapshot = ContextSnapshot::from_bytes(&bytes).unwrap();
        let mut resumed = AvidaContext::restore(&snapshot);
        let got: Vec<u32> = (0..10).map(|_| resumed.random_u32()).collect();
        assert_eq!(expected, got);
        assert_eq!(resumed.ids.peek(), 1);
        assert_eq!(resumed.seed(), 5);
    }

    #[test]
    fn ids_are_sequential() {
        let mut ids = IdAllocator::new();
        assert_eq!(ids.next_id(), 0);
        assert_eq!(ids.next_id(), 1);
        assert_eq!(ids.peek(), 2);
    }
}
