use serde::{Deserialize, Serialize};

use crate::{AbsoluteAddress, Operand, RelativeAddress};

/// Mnemonic stored for a one-byte "undecodable" data instruction.
pub const DATA_MNEMONIC: &str = "db";

/// Display hint carried by a plain one-byte data instruction.
pub const DATA_DISP_BYTES: &str = "bytes";

/// Mnemonic stored for the single data instruction the string parser
/// collapses a run of bytes into.
pub const STRING_MNEMONIC: &str = ".db";

/// Display hint carried by a string-backed data instruction.
pub const DATA_DISP_STR: &str = "str";

/// Either a decoded instruction's operands, or a data instruction's display
/// hint.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum InstructionBody {
    /// A decoded, textual instruction.
    Text {
        /// Decoded operands, in the order the decoder produced them.
        operands: Vec<Operand>,
    },
    /// Raw, undecoded bytes with a rendering hint.
    Data {
        /// Rendering hint, e.g. [`DATA_DISP_BYTES`] or [`DATA_DISP_STR`].
        disp: String,
    },
}

/// A single decoded instruction, or a run of raw bytes treated as data.
///
/// Invariant: for any section `S`, the set of instructions in `S` covers
/// every byte of `S` exactly once.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Instruction {
    /// Address relative to the containing section.
    pub r_addr: RelativeAddress,
    /// Absolute address, i.e. `section.base + r_addr`.
    pub abs_addr: AbsoluteAddress,
    /// Whether this instruction was decoded as text (`true`) or emitted as
    /// data (`false`).
    pub is_text: bool,
    /// Raw bytes, length `>= 1`.
    pub bytes: Vec<u8>,
    /// Mnemonic, e.g. `"mov"`, or [`DATA_MNEMONIC`]/[`STRING_MNEMONIC`] for
    /// data.
    pub mnemonic: String,
    /// Operands (text) or display hint (data).
    pub body: InstructionBody,
}

impl Instruction {
    /// Build a decoded, textual instruction.
    pub fn text(
        r_addr: RelativeAddress,
        abs_addr: AbsoluteAddress,
        bytes: Vec<u8>,
        mnemonic: impl Into<String>,
        operands: Vec<Operand>,
    ) -> Self {
        Self {
            r_addr,
            abs_addr,
            is_text: true,
            bytes,
            mnemonic: mnemonic.into(),
            body: InstructionBody::Text { operands },
        }
    }

    /// Build a one-byte data instruction for an undecodable byte.
    pub fn data_byte(r_addr: RelativeAddress, abs_addr: AbsoluteAddress, byte: u8) -> Self {
        Self {
            r_addr,
            abs_addr,
            is_text: false,
            bytes: vec![byte],
            mnemonic: DATA_MNEMONIC.to_string(),
            body: InstructionBody::Data { disp: DATA_DISP_BYTES.to_string() },
        }
    }

    /// Build the single data instruction the string parser collapses a
    /// matched run of bytes into.
    pub fn data_string(r_addr: RelativeAddress, abs_addr: AbsoluteAddress, bytes: Vec<u8>) -> Self {
        Self {
            r_addr,
            abs_addr,
            is_text: false,
            bytes,
            mnemonic: STRING_MNEMONIC.to_string(),
            body: InstructionBody::Data { disp: DATA_DISP_STR.to_string() },
        }
    }

    /// Half-open relative byte range `[r_addr, r_addr + bytes.len())` covered
    /// by this instruction.
    pub fn relative_range(&self) -> std::ops::Range<RelativeAddress> {
        self.r_addr..(self.r_addr + self.bytes.len() as u64)
    }

    /// Operands, if this is a textual instruction.
    pub fn operands(&self) -> Option<&[Operand]> {
        match &self.body {
            InstructionBody::Text { operands } => Some(operands),
            InstructionBody::Data { .. } => None,
        }
    }

    /// Mutable operands, if this is a textual instruction.
    pub fn operands_mut(&mut self) -> Option<&mut Vec<Operand>> {
        match &mut self.body {
            InstructionBody::Text { operands } => Some(operands),
            InstructionBody::Data { .. } => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_data_byte_is_one_byte_wide() {
        let instruction = Instruction::data_byte(4, 0x1004, 0xcc);

        assert_eq!(instruction.relative_range(), 4..5);
        assert!(!instruction.is_text);
        assert_eq!(instruction.mnemonic, "db");
    }

    #[test]
    fn test_data_string_mnemonic_is_distinct_from_plain_data() {
        let instruction = Instruction::data_string(0, 0x2000, b"hello".to_vec());

        assert_eq!(instruction.mnemonic, ".db");
        assert_eq!(instruction.relative_range(), 0..5);
    }
}
