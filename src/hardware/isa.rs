//! Instruction libraries and instruction sets.
//!
//! Each hardware flavor has a fixed **library**: every instruction it knows
//! how to execute, listed once in [`for_each_heads_instruction!`] or
//! [`for_each_stack_instruction!`]. Those macros hand the list to a callback
//! macro so the library enum, the name table and the handler table are all
//! generated from the same rows.
//!
//! An [`InstructionSet`] is a configured subset of one library. Opcode ids
//! are positions in the set, so genomes are only meaningful relative to the
//! set they were written for. Names are resolved to library rows once, when
//! the set is built; execution indexes straight into the handler table.
//!
//! # Genome text form
//!
//! Opcode `i` is displayed as the `i`-th character of
//! `a..z A..Z 0..9`, which caps a set at 62 instructions.

use crate::hardware::errors::HardwareError;
use crate::hardware::{heads_cpu, stack_cpu};
use avida_derive::BinaryCodec;
use rand::Rng;

/// Largest instruction set the one-character text form can address.
pub const MAX_INSTRUCTIONS: usize = 62;

const SYMBOLS: &[u8; MAX_INSTRUCTIONS] =
    b"abcdefghijklmnopqrstuvwxyzABCDEFGHIJKLMNOPQRSTUVWXYZ0123456789";

/// Name of the do-nothing instruction used for knockouts.
pub const KNOCKOUT_NAME: &str = "nop-X";

/// Invokes `$callback` with the heads-CPU instruction library.
///
/// Row format: `Variant = "name", nop modifier, handler method`.
#[macro_export]
macro_rules! for_each_heads_instruction {
    ($callback:ident) => {
        $callback! {
            HeadsInst, HeadsCpu;
            // =========================
            // Nops
            // =========================
            /// Label nop; as a modifier selects AX / the IP head.
            NopA = "nop-A", Some(0), inst_nop,
            /// Label nop; as a modifier selects BX / the READ head.
            NopB = "nop-B", Some(1), inst_nop,
            /// Label nop; as a modifier selects CX / the WRITE head.
            NopC = "nop-C", Some(2), inst_nop,
            /// True no-op: never part of a label, used for knockouts.
            NopX = "nop-X", None, inst_nop,
            // =========================
            // Conditionals
            // =========================
            /// Skip the next instruction if ?BX? equals its successor register.
            IfNEqu = "if-n-equ", None, inst_if_n_equ,
            /// Skip the next instruction if ?BX? differs from its successor.
            IfEqu = "if-equ", None, inst_if_equ,
            /// Skip the next instruction unless ?BX? < its successor.
            IfLess = "if-less", None, inst_if_less,
            /// Skip the next instruction unless ?BX? > its successor.
            IfGrt = "if-grt", None, inst_if_grt,
            /// Skip the next instruction unless the low bit of ?BX? is set.
            IfBit1 = "if-bit-1", None, inst_if_bit_1,
            /// Skip the next instruction unless the complement of the
            /// following label was just copied.
            IfLabel = "if-label", None, inst_if_label,
            // =========================
            // Stacks
            // =========================
            /// ?BX? = pop active stack.
            Pop = "pop", None, inst_pop,
            /// Push ?BX? onto the active stack.
            Push = "push", None, inst_push,
            /// Toggle between the local and the global stack.
            SwapStk = "swap-stk", None, inst_swap_stk,
            // =========================
            // Registers
            // =========================
            /// Swap ?AX? with its successor register.
            Swap = "swap", None, inst_swap,
            /// ?BX? >>= 1
            ShiftR = "shift-r", None, inst_shift_r,
            /// ?BX? <<= 1
            ShiftL = "shift-l", None, inst_shift_l,
            /// ?BX? += 1
            Inc = "inc", None, inst_inc,
            /// ?BX? -= 1
            Dec = "dec", None, inst_dec,
            /// ?BX? = 0
            Zero = "zero", None, inst_zero,
            /// ?BX? = BX + CX
            Add = "add", None, inst_add,
            /// ?BX? = BX - CX
            Sub = "sub", None, inst_sub,
            /// ?BX? = BX * CX
            Mult = "mult", None, inst_mult,
            /// ?BX? = BX / CX (math fault on zero)
            Div = "div", None, inst_div,
            /// ?BX? = BX % CX (math fault on zero)
            Mod = "mod", None, inst_mod,
            /// ?BX? = !(BX & CX)
            Nand = "nand", None, inst_nand,
            /// Output ?BX?, then read the next input into it.
            Io = "IO", None, inst_io,
            // =========================
            // Replication
            // =========================
            /// Allocate space for an offspring; AX = old size.
            HAlloc = "h-alloc", None, inst_h_alloc,
            /// Divide at the READ head; the child ends at the WRITE head.
            HDivide = "h-divide", None, inst_h_divide,
            /// Copy READ head to WRITE head, advancing both.
            HCopy = "h-copy", None, inst_h_copy,
            /// Find the complement of the following label; BX = distance,
            /// CX = label size, FLOW = just past the match.
            HSearch = "h-search", None, inst_h_search,
            /// BX = instruction under ?READ?, advancing it.
            HRead = "h-read", None, inst_h_read,
            /// Write BX under ?WRITE?, advancing it.
            HWrite = "h-write", None, inst_h_write,
            // =========================
            // Heads
            // =========================
            /// Push the position of ?IP? onto the active stack.
            HPush = "h-push", None, inst_h_push,
            /// Pop the active stack into the position of ?IP?.
            HPop = "h-pop", None, inst_h_pop,
            /// Move ?IP? to the FLOW head.
            MovHead = "mov-head", None, inst_mov_head,
            /// Jump ?IP? by CX.
            JmpHead = "jmp-head", None, inst_jmp_head,
            /// CX = position of ?IP?.
            GetHead = "get-head", None, inst_get_head,
            /// Make ?IP? the current head.
            SetHead = "set-head", None, inst_set_head,
            /// Advance ?WRITE? by one.
            AdvHead = "adv-head", None, inst_adv_head,
            /// FLOW = ?CX?.
            SetFlow = "set-flow", None, inst_set_flow,
            // =========================
            // Threads
            // =========================
            /// Fork a new thread; the parent skips the next instruction.
            ForkTh = "fork-th", None, inst_fork_th,
            /// Kill the current thread.
            KillTh = "kill-th", None, inst_kill_th,
            /// ?BX? = current thread id.
            IdTh = "id-th", None, inst_id_th,
        }
    };
}

/// Invokes `$callback` with the four-stack CPU instruction library.
#[macro_export]
macro_rules! for_each_stack_instruction {
    ($callback:ident) => {
        $callback! {
            StackInst, StackCpu;
            /// Label nop; modifier for stack AX / the IP head.
            NopA = "Nop-A", Some(0), inst_nop,
            /// Label nop; modifier for stack BX / the READ head.
            NopB = "Nop-B", Some(1), inst_nop,
            /// Label nop; modifier for stack CX / the WRITE head.
            NopC = "Nop-C", Some(2), inst_nop,
            /// Label nop; modifier for stack DX / the FLOW head.
            NopD = "Nop-D", Some(3), inst_nop,
            /// True no-op used for knockouts.
            NopX = "nop-X", None, inst_nop,
            /// Replace the top of ?BX? with itself shifted right.
            ValShiftR = "Val-Shift-R", None, inst_val_shift_r,
            /// Replace the top of ?BX? with itself shifted left.
            ValShiftL = "Val-Shift-L", None, inst_val_shift_l,
            /// Push !(BX & CX) onto ?BX?.
            ValNand = "Val-Nand", None, inst_val_nand,
            /// Push BX + CX onto ?BX?.
            ValAdd = "Val-Add", None, inst_val_add,
            /// Push BX - CX onto ?BX?.
            ValSub = "Val-Sub", None, inst_val_sub,
            /// Push BX * CX onto ?BX?.
            ValMult = "Val-Mult", None, inst_val_mult,
            /// Push BX / CX onto ?BX? (math fault on zero).
            ValDiv = "Val-Div", None, inst_val_div,
            /// Push BX % CX onto ?BX? (math fault on zero).
            ValMod = "Val-Mod", None, inst_val_mod,
            /// Increment the top of ?BX?.
            ValInc = "Val-Inc", None, inst_val_inc,
            /// Decrement the top of ?BX?.
            ValDec = "Val-Dec", None, inst_val_dec,
            /// Pop ?BX? and discard the value.
            ValDelete = "Val-Delete", None, inst_val_delete,
            /// Duplicate the top of ?BX?.
            ValCopy = "Val-Copy", None, inst_val_copy,
            /// Move the top of ?AX? onto the next stack.
            PushNext = "Push-Next", None, inst_push_next,
            /// Move the top of ?AX? onto the previous stack.
            PushPrev = "Push-Prev", None, inst_push_prev,
            /// Move the top of ?AX? onto the opposite stack.
            PushComp = "Push-Comp", None, inst_push_comp,
            /// Skip unless the top of ?BX? equals the top of the next stack.
            IfEqual = "If-Equal", None, inst_if_equal,
            /// Skip unless the top of ?BX? differs from the next stack's top.
            IfNotEqual = "If-Not-Equal", None, inst_if_not_equal,
            /// Skip unless the top of ?BX? is below the next stack's top.
            IfLess = "If-Less", None, inst_if_less,
            /// Skip unless the top of ?BX? is above the next stack's top.
            IfGreater = "If-Greater", None, inst_if_greater,
            /// Skip unless the complement of the following label was just copied.
            IfLabel = "If-Label", None, inst_if_label,
            /// Push the position of ?IP? onto stack BX.
            HeadPush = "Head-Push", None, inst_head_push,
            /// Pop stack BX into the position of ?FLOW?.
            HeadPop = "Head-Pop", None, inst_head_pop,
            /// Move ?IP? to FLOW (FLOW itself just advances).
            HeadMove = "Head-Move", None, inst_head_move,
            /// Copy READ head to WRITE head, advancing both.
            HeadCopy = "Head-Copy", None, inst_head_copy,
            /// Find the complement of the following label; pushes the distance on
            /// BX and the label size on AX, FLOW = just past the match.
            Search = "Search", None, inst_search,
            /// Allocate space for an offspring; old size pushed onto AX.
            Alloc = "Alloc", None, inst_alloc,
            /// Divide at the READ head; the child ends at the WRITE head.
            Divide = "Divide", None, inst_divide,
            /// Push the instruction under ?READ? onto AX, advancing it.
            InstRead = "Inst-Read", None, inst_inst_read,
            /// Pop AX and write it under ?WRITE?, advancing it.
            InstWrite = "Inst-Write", None, inst_inst_write,
            /// Output the top of ?BX? and push the next input onto it.
            Io = "IO", None, inst_io,
            /// Fork a new thread; the parent skips the next instruction.
            ForkThread = "Fork-Thread", None, inst_fork_thread,
            /// Kill the current thread.
            KillThread = "Kill-Thread", None, inst_kill_thread,
        }
    };
}

/// Generates a library enum plus its [`LibraryEntry`] table.
#[macro_export]
macro_rules! define_library {
    (
        $lib:ident, $cpu:ident;
        $( $(#[$doc:meta])* $name:ident = $mnemonic:literal, $nop:expr, $handler:ident ),* $(,)?
    ) => {
        /// Every instruction this hardware can execute.
        #[derive(Copy, Clone, Debug, Eq, PartialEq)]
        pub enum $lib {
            $( $(#[$doc])* $name, )*
        }

        impl $lib {
            pub const ALL: &'static [$lib] = &[ $( $lib::$name, )* ];

            pub const fn name(self) -> &'static str {
                match self {
                    $( $lib::$name => $mnemonic, )*
                }
            }

            pub const fn nop_mod(self) -> Option<u8> {
                match self {
                    $( $lib::$name => $nop, )*
                }
            }
        }

        pub static LIBRARY: &[$crate::hardware::isa::LibraryEntry] = &[
            $( $crate::hardware::isa::LibraryEntry { name: $mnemonic, nop_mod: $nop }, )*
        ];
    };
}

/// One row of a hardware library.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct LibraryEntry {
    pub name: &'static str,
    pub nop_mod: Option<u8>,
}

/// Opcode id within an [`InstructionSet`].
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, PartialOrd, Ord, BinaryCodec)]
pub struct Instruction(pub u8);

impl Instruction {
    pub const fn new(op: u8) -> Self {
        Self(op)
    }

    pub const fn op(self) -> u8 {
        self.0
    }

    pub const fn index(self) -> usize {
        self.0 as usize
    }
}

/// Hardware flavors an organism can be built on.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, BinaryCodec)]
pub enum HardwareKind {
    /// Register machine with four heads, one local and one global stack.
    Heads = 0,
    /// Four-stack machine: three local stacks plus one global stack.
    FourStack = 1,
}

impl HardwareKind {
    pub const fn name(self) -> &'static str {
        match self {
            HardwareKind::Heads => "heads",
            HardwareKind::FourStack => "4stack",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "heads" | "0" => Some(HardwareKind::Heads),
            "4stack" | "1" => Some(HardwareKind::FourStack),
            _ => None,
        }
    }

    /// Number of distinct label nops, the base used for complements.
    pub const fn num_nops(self) -> usize {
        match self {
            HardwareKind::Heads => 3,
            HardwareKind::FourStack => 4,
        }
    }

    /// Rotation that turns a label into its complement.
    pub const fn complement_shift(self) -> u8 {
        match self {
            HardwareKind::Heads => 1,
            HardwareKind::FourStack => 2,
        }
    }

    pub fn library(self) -> &'static [LibraryEntry] {
        match self {
            HardwareKind::Heads => heads_cpu::LIBRARY,
            HardwareKind::FourStack => stack_cpu::LIBRARY,
        }
    }

    /// Default instruction names, in opcode order.
    pub fn default_names(self) -> Vec<&'static str> {
        match self {
            HardwareKind::Heads => heads_cpu::DEFAULT_SET.iter().map(|i| i.name()).collect(),
            HardwareKind::FourStack => stack_cpu::DEFAULT_SET.iter().map(|i| i.name()).collect(),
        }
    }
}

/// Requested attributes for one instruction of a set.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct InstSpec {
    pub name: String,
    /// Relative weight when drawing random instructions; 0 = never drawn.
    pub redundancy: u32,
    /// Cycles charged per use.
    pub cost: u32,
    /// Extra cycles charged the first time the instruction runs each
    /// generation.
    pub ft_cost: u32,
}

impl InstSpec {
    pub fn named(name: &str) -> Self {
        Self {
            name: name.to_string(),
            redundancy: 1,
            cost: 0,
            ft_cost: 0,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct InstEntry {
    pub name: &'static str,
    pub lib_index: usize,
    pub nop_mod: Option<u8>,
    pub redundancy: u32,
    pub cost: u32,
    pub ft_cost: u32,
}

/// Ordered catalog of the instructions available to one population.
#[derive(Clone, Debug)]
pub struct InstructionSet {
    kind: HardwareKind,
    entries: Vec<InstEntry>,
    /// Each opcode repeated `redundancy` times, for weighted random draws.
    mutation_chart: Vec<Instruction>,
}

impl InstructionSet {
    /// Builds a set from explicit specs, resolving each name against the
    /// library of `kind`.
    ///
    /// Returns [`HardwareError::UnknownInstructionName`] for names the
    /// hardware does not implement.
    pub fn new(kind: HardwareKind, specs: &[InstSpec]) -> Result<Self, HardwareError> {
        if specs.is_empty() {
            return Err(HardwareError::Config {
                line: 0,
                reason: "instruction set is empty".to_string(),
            });
        }
        if specs.len() > MAX_INSTRUCTIONS {
            return Err(HardwareError::TooManyInstructions {
                max: MAX_INSTRUCTIONS,
            });
        }

        let library = kind.library();
        let mut entries = Vec::with_capacity(specs.len());
        for spec in specs {
            let lib_index = library
                .iter()
                .position(|entry| entry.name == spec.name)
                .ok_or_else(|| HardwareError::UnknownInstructionName {
                    name: spec.name.clone(),
                    hardware: kind.name(),
                })?;
            let entry = library[lib_index];
            entries.push(InstEntry {
                name: entry.name,
                lib_index,
                nop_mod: entry.nop_mod,
                redundancy: spec.redundancy,
                cost: spec.cost,
                ft_cost: spec.ft_cost,
            });
        }

        let mutation_chart = entries
            .iter()
            .enumerate()
            .flat_map(|(op, entry)| {
                std::iter::repeat(Instruction(op as u8)).take(entry.redundancy as usize)
            })
            .collect();

        Ok(Self {
            kind,
            entries,
            mutation_chart,
        })
    }

    /// Builds a set of the given names, each with redundancy 1 and no cost.
    pub fn from_names(kind: HardwareKind, names: &[&str]) -> Result<Self, HardwareError> {
        let specs: Vec<InstSpec> = names.iter().map(|n| InstSpec::named(n)).collect();
        Self::new(kind, &specs)
    }

    /// The classic set for `kind` followed by a never-drawn `nop-X`.
    pub fn default_for(kind: HardwareKind) -> Self {
        let library = kind.library();
        let mut entries: Vec<InstEntry> = kind
            .default_names()
            .into_iter()
            .chain(std::iter::once(KNOCKOUT_NAME))
            .filter_map(|name| {
                let lib_index = library.iter().position(|e| e.name == name)?;
                Some(InstEntry {
                    name,
                    lib_index,
                    nop_mod: library[lib_index].nop_mod,
                    redundancy: 1,
                    cost: 0,
                    ft_cost: 0,
                })
            })
            .collect();
        if let Some(knockout) = entries.last_mut() {
            knockout.redundancy = 0;
        }
        let mutation_chart = entries
            .iter()
            .enumerate()
            .filter(|(_, e)| e.redundancy > 0)
            .map(|(op, _)| Instruction(op as u8))
            .collect();
        Self {
            kind,
            entries,
            mutation_chart,
        }
    }

    /// Parses an instruction-set listing: one instruction per line as
    /// `name [redundancy [cost [ft_cost]]]`, with `#` comments.
    pub fn parse(kind: HardwareKind, text: &str) -> Result<Self, HardwareError> {
        let mut specs = Vec::new();
        for (idx, raw) in text.lines().enumerate() {
            let line = raw.split('#').next().unwrap_or("").trim();
            if line.is_empty() {
                continue;
            }
            let mut fields = line.split_whitespace();
            let Some(name) = fields.next() else {
                continue;
            };
            let mut spec = InstSpec::named(name);
            let mut numbers = [None::<u32>; 3];
            for slot in numbers.iter_mut() {
                match fields.next() {
                    Some(field) => {
                        *slot = Some(field.parse().map_err(|_| HardwareError::Config {
                            line: idx + 1,
                            reason: format!("'{}' is not a non-negative integer", field),
                        })?);
                    }
                    None => break,
                }
            }
            if let Some(redundancy) = numbers[0] {
                spec.redundancy = redundancy;
            }
            if let Some(cost) = numbers[1] {
                spec.cost = cost;
            }
            if let Some(ft_cost) = numbers[2] {
                spec.ft_cost = ft_cost;
            }
            specs.push(spec);
        }
        Self::new(kind, &specs)
    }

    pub fn kind(&self) -> HardwareKind {
        self.kind
    }

    pub fn size(&self) -> usize {
        self.entries.len()
    }

    pub fn contains(&self, inst: Instruction) -> bool {
        inst.index() < self.entries.len()
    }

    pub fn entry(&self, inst: Instruction) -> Option<&InstEntry> {
        self.entries.get(inst.index())
    }

    /// Instruction name, or `"?"` for ids outside the set.
    pub fn name(&self, inst: Instruction) -> &'static str {
        self.entry(inst).map(|e| e.name).unwrap_or("?")
    }

    /// Display character for an opcode.
    pub fn symbol(&self, inst: Instruction) -> char {
        SYMBOLS
            .get(inst.index())
            .map(|&b| b as char)
            .unwrap_or('?')
    }

    pub fn from_symbol(&self, symbol: char) -> Option<Instruction> {
        let op = SYMBOLS.iter().position(|&b| b as char == symbol)?;
        (op < self.entries.len()).then_some(Instruction(op as u8))
    }

    pub fn from_name(&self, name: &str) -> Option<Instruction> {
        self.entries
            .iter()
            .position(|e| e.name == name)
            .map(|op| Instruction(op as u8))
    }

    #[inline]
    pub fn lib_index(&self, inst: Instruction) -> Option<usize> {
        self.entries.get(inst.index()).map(|e| e.lib_index)
    }

    #[inline]
    pub fn is_nop(&self, inst: Instruction) -> bool {
        self.nop_mod(inst).is_some()
    }

    #[inline]
    pub fn nop_mod(&self, inst: Instruction) -> Option<u8> {
        self.entries.get(inst.index()).and_then(|e| e.nop_mod)
    }

    pub fn num_nops(&self) -> usize {
        self.kind.num_nops()
    }

    pub fn cost(&self, inst: Instruction) -> u32 {
        self.entry(inst).map(|e| e.cost).unwrap_or(0)
    }

    pub fn ft_cost(&self, inst: Instruction) -> u32 {
        self.entry(inst).map(|e| e.ft_cost).unwrap_or(0)
    }

    pub fn has_costs(&self) -> bool {
        self.entries.iter().any(|e| e.cost > 0)
    }

    pub fn has_ft_costs(&self) -> bool {
        self.entries.iter().any(|e| e.ft_cost > 0)
    }

    /// Opcode 0; fills freshly allocated memory.
    pub fn default_instruction(&self) -> Instruction {
        Instruction(0)
    }

    /// The never-drawn no-op used to knock out genome sites, if the set has one.
    pub fn knockout_instruction(&self) -> Option<Instruction> {
        self.from_name(KNOCKOUT_NAME)
    }

    /// Draws an opcode weighted by redundancy. Sets whose every entry has
    /// redundancy 0 fall back to the default instruction.
    pub fn random_instruction<R: Rng + ?Sized>(&self, rng: &mut R) -> Instruction {
        if self.mutation_chart.is_empty() {
            return self.default_instruction();
        }
        self.mutation_chart[rng.gen_range(0..self.mutation_chart.len())]
    }

    pub fn iter(&self) -> impl Iterator<Item = (Instruction, &InstEntry)> {
        self.entries
            .iter()
            .enumerate()
            .map(|(op, e)| (Instruction(op as u8), e))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;

    #[test]
    fn default_heads_set_uses_classic_symbols() {
        let set = InstructionSet::default_for(HardwareKind::Heads);
        assert_eq!(set.size(), 27);
        assert_eq!(set.name(Instruction(0)), "nop-A");
        assert_eq!(set.symbol(Instruction(0)), 'a');
        assert_eq!(set.name(Instruction(17)), "h-alloc");
        assert_eq!(set.symbol(Instruction(17)), 'r');
        assert_eq!(set.name(Instruction(25)), "set-flow");
        assert_eq!(set.symbol(Instruction(26)), 'A');
        assert_eq!(set.knockout_instruction(), Some(Instruction(26)));
    }

    #[test]
    fn nops_carry_modifiers() {
        let set = InstructionSet::default_for(HardwareKind::Heads);
        assert_eq!(set.nop_mod(Instruction(2)), Some(2));
        assert!(set.is_nop(Instruction(1)));
        assert!(!set.is_nop(Instruction(3)));
        assert!(!set.is_nop(set.knockout_instruction().unwrap()));
    }

    #[test]
    fn unknown_name_is_rejected() {
        let err = InstructionSet::from_names(HardwareKind::Heads, &["nop-A", "Val-Add"]).unwrap_err();
        assert_eq!(
            err,
            HardwareError::UnknownInstructionName {
                name: "Val-Add".to_string(),
                hardware: "heads",
            }
        );
    }

    #[test]
    fn parse_reads_redundancy_and_costs() {
        let text = "nop-A 1 # a\nnop-B\n\n# comment\nh-copy 2 3 4\n";
        let set = InstructionSet::parse(HardwareKind::Heads, text).unwrap();
        assert_eq!(set.size(), 3);
        let copy = set.from_name("h-copy").unwrap();
        assert_eq!(set.cost(copy), 3);
        assert_eq!(set.ft_cost(copy), 4);
        assert!(set.has_costs());
    }

    #[test]
    fn parse_reports_line_of_bad_number() {
        let err = InstructionSet::parse(HardwareKind::Heads, "nop-A\nnop-B x\n").unwrap_err();
        assert!(matches!(err, HardwareError::Config { line: 2, .. }));
    }

    #[test]
    fn random_draws_skip_zero_redundancy() {
        let set = InstructionSet::default_for(HardwareKind::Heads);
        let knockout = set.knockout_instruction().unwrap();
        let mut rng = ChaCha8Rng::seed_from_u64(7);
        for _ in 0..5000 {
            let inst = set.random_instruction(&mut rng);
            assert!(set.contains(inst));
            assert_ne!(inst, knockout);
        }
    }

    #[test]
    fn symbol_lookup_respects_set_size() {
        let set = InstructionSet::from_names(HardwareKind::Heads, &["nop-A", "nop-B"]).unwrap();
        assert_eq!(set.from_symbol('b'), Some(Instruction(1)));
        assert_eq!(set.from_symbol('c'), None);
    }

    #[test]
    fn too_many_instructions() {
        let specs = vec![InstSpec::named("nop-A"); MAX_INSTRUCTIONS + 1];
        assert_eq!(
            InstructionSet::new(HardwareKind::Heads, &specs).unwrap_err(),
            HardwareError::TooManyInstructions {
                max: MAX_INSTRUCTIONS
            }
        );
    }
}
