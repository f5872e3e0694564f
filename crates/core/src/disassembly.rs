use serde::{Deserialize, Serialize};

use crate::{AbsoluteAddress, Arch, Format, Mode};

/// An immutable descriptor of one disassembly run. Uniqueness of
/// `(project, disassembly_name)` is enforced by the store, not by this type.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Disassembly {
    /// Name of the disassembly, unique within its project.
    pub name: String,
    /// Name of the binary file this disassembly was created from.
    pub binary_name: String,
    /// Container format.
    pub format: Format,
    /// Instruction set architecture.
    pub arch: Arch,
    /// Word size and endianness.
    pub mode: Mode,
    /// MD5 digest of the binary file's contents.
    pub md5: [u8; 16],
    /// Size, in bytes, of the binary file.
    pub size: u64,
    /// Absolute entry point address.
    pub entry_point: AbsoluteAddress,
}

impl Disassembly {
    /// Render [`Self::md5`] as a lowercase hex string, e.g. for display or
    /// for a persisted-record key.
    pub fn md5_hex(&self) -> String {
        self.md5.iter().map(|byte| format!("{byte:02x}")).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_md5_hex() {
        let disassembly = Disassembly {
            name: "main".to_string(),
            binary_name: "a.out".to_string(),
            format: Format::Elf,
            arch: Arch::X86,
            mode: Mode::Bits64Little,
            md5: [0xab; 16],
            size: 4096,
            entry_point: 0x1000,
        };

        assert_eq!(disassembly.md5_hex(), "ab".repeat(16));
    }
}
