use serde::{Deserialize, Serialize};

/// Binary container format recognized by the front-end.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Format {
    /// Executable and Linkable Format.
    Elf,
    /// Portable Executable, stubbed: the front-end never fails on it, but
    /// never decodes it either.
    Pe,
    /// Mach-O, stubbed for the same reason as [`Format::Pe`].
    MachO,
}

/// Instruction set architecture, opaque to everything but the heuristics and
/// the decoder.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Arch {
    /// Intel/AMD x86, 32- or 64-bit (see [`Mode`]).
    X86,
    /// 32-bit ARM.
    Arm,
    /// 64-bit ARM (AArch64).
    Arm64,
    /// MIPS.
    Mips,
    /// PowerPC.
    Ppc,
}

/// Word size and byte order, an opaque tag consumed by the decoder.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Mode {
    /// 32-bit, little-endian.
    Bits32Little,
    /// 32-bit, big-endian.
    Bits32Big,
    /// 64-bit, little-endian.
    Bits64Little,
    /// 64-bit, big-endian.
    Bits64Big,
}

impl Mode {
    /// Whether this mode describes a 64-bit word size.
    pub fn is_64_bits(self) -> bool {
        matches!(self, Self::Bits64Little | Self::Bits64Big)
    }

    /// Whether this mode describes a little-endian byte order.
    pub fn is_little_endian(self) -> bool {
        matches!(self, Self::Bits32Little | Self::Bits64Little)
    }
}
