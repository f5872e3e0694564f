use enumflags2::{bitflags, BitFlags};
use serde::{Deserialize, Serialize};

use crate::AbsoluteAddress;

/// A single attribute of a [`Section`], as scanned out of the section header
/// flag string (`R`/`W`/`X`/`A` letters).
#[bitflags]
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Attribute {
    /// Readable.
    Read = 0b0001,
    /// Writable.
    Write = 0b0010,
    /// Executable; governs whether a strategy treats the section as code or
    /// data.
    Execute = 0b0100,
    /// Allocated at runtime (appended to the loaded image).
    Append = 0b1000,
}

/// A contiguous, addressed region of a binary with uniform attributes.
///
/// Created once by the front-end when it enumerates the binary, and
/// immutable thereafter: `size == bytes.len()` always holds, and the
/// pipeline never mutates `bytes` after construction.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Section {
    /// Name of the section, e.g. `.text`.
    pub name: String,
    /// Raw bytes of the section as they appear in the loaded image.
    pub bytes: Vec<u8>,
    /// Flags scanned from the section header.
    #[serde(with = "attributes_serde")]
    pub attributes: BitFlags<Attribute>,
    /// Absolute base address of the section.
    pub base_addr: AbsoluteAddress,
}

impl Section {
    /// Create a new section. Panics in debug builds if `bytes.len()` would
    /// overflow `u64`, which cannot happen for any binary this tool is meant
    /// to read.
    pub fn new(
        name: impl Into<String>,
        bytes: Vec<u8>,
        attributes: BitFlags<Attribute>,
        base_addr: AbsoluteAddress,
    ) -> Self {
        Self { name: name.into(), bytes, attributes, base_addr }
    }

    /// Size of the section, i.e. `bytes.len()`.
    pub fn size(&self) -> u64 {
        self.bytes.len() as u64
    }

    /// Whether this section is marked executable.
    pub fn is_executable(&self) -> bool {
        self.attributes.contains(Attribute::Execute)
    }

    /// Half-open absolute address range `[base_addr, base_addr + size)`
    /// covered by this section.
    pub fn address_range(&self) -> std::ops::Range<AbsoluteAddress> {
        self.base_addr..(self.base_addr + self.size())
    }

    /// Whether `addr` falls within this section's address range.
    pub fn contains_addr(&self, addr: AbsoluteAddress) -> bool {
        self.address_range().contains(&addr)
    }

    /// Scan a section-header flag string (e.g. `"WA"`, `"AX"`) for the
    /// `R`/`W`/`X`/`A` letters.
    pub fn attributes_from_flag_string(flags: &str) -> BitFlags<Attribute> {
        let mut attributes = BitFlags::empty();

        for letter in flags.chars() {
            match letter {
                'R' | 'r' => attributes |= Attribute::Read,
                'W' | 'w' => attributes |= Attribute::Write,
                'X' | 'x' => attributes |= Attribute::Execute,
                'A' | 'a' => attributes |= Attribute::Append,
                _ => {}
            }
        }

        attributes
    }
}

mod attributes_serde {
    use enumflags2::BitFlags;
    use serde::{Deserialize, Deserializer, Serialize, Serializer};

    use super::Attribute;

    pub(super) fn serialize<S>(
        flags: &BitFlags<Attribute>,
        serializer: S,
    ) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        flags.bits().serialize(serializer)
    }

    pub(super) fn deserialize<'de, D>(deserializer: D) -> Result<BitFlags<Attribute>, D::Error>
    where
        D: Deserializer<'de>,
    {
        let bits = u8::deserialize(deserializer)?;

        BitFlags::from_bits(bits).map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_attributes_from_flag_string() {
        assert_eq!(Section::attributes_from_flag_string("AX"), Attribute::Append | Attribute::Execute);
        assert_eq!(Section::attributes_from_flag_string("WA"), Attribute::Write | Attribute::Append);
        assert_eq!(Section::attributes_from_flag_string(""), BitFlags::empty());
    }

    #[test]
    fn test_contains_addr() {
        let section = Section::new("text", vec![0u8; 16], Attribute::Execute.into(), 0x1000);

        assert!(section.contains_addr(0x1000));
        assert!(section.contains_addr(0x100f));
        assert!(!section.contains_addr(0x1010));
    }
}
