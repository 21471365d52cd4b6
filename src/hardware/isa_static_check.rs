//! Guards the instruction library layout.
//!
//! Genomes and checkpoints store opcodes by position, so reordering,
//! renaming or rewiring a library row silently changes what saved organisms
//! do. If one of these hashes moves, update the constant on purpose.

#[cfg(test)]
mod tests {
    const FNV_OFFSET: u64 = 0xcbf29ce484222325;
    const FNV_PRIME: u64 = 0x100000001b3;
    const EXPECTED_HEADS_HASH: u64 = 2206123279068696044;
    const EXPECTED_STACK_HASH: u64 = 16245820041056396182;

    fn fnv1a64(mut h: u64, bytes: &[u8]) -> u64 {
        for b in bytes {
            h ^= *b as u64;
            h = h.wrapping_mul(FNV_PRIME);
        }
        h
    }

    macro_rules! hash_library {
        (
            $lib:ident, $cpu:ident;
            $( $(#[$doc:meta])* $name:ident = $mnemonic:literal, $nop:expr, $handler:ident ),* $(,)?
        ) => {{
            let mut h = FNV_OFFSET;
            let mut index: u8 = 0;
            $(
                let nop: Option<u8> = $nop;
                h = fnv1a64(h, stringify!($name).as_bytes());
                h = fnv1a64(h, &[index]);
                h = fnv1a64(h, $mnemonic.as_bytes());
                h = fnv1a64(h, &[nop.unwrap_or(u8::MAX)]);
                h = fnv1a64(h, stringify!($handler).as_bytes());
                index += 1;
            )*
            let _ = index;
            h
        }};
    }

    fn heads_hash() -> u64 {
        crate::for_each_heads_instruction!(hash_library)
    }

    fn stack_hash() -> u64 {
        crate::for_each_stack_instruction!(hash_library)
    }

    #[test]
    #[ignore]
    fn print_library_hashes() {
        println!("HEADS_HASH={}", heads_hash());
        println!("STACK_HASH={}", stack_hash());
    }

    #[test]
    fn heads_library_unchanged() {
        assert_eq!(heads_hash(), EXPECTED_HEADS_HASH);
    }

    #[test]
    fn stack_library_unchanged() {
        assert_eq!(stack_hash(), EXPECTED_STACK_HASH);
    }
}
