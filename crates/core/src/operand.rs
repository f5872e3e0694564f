use serde::{Deserialize, Serialize};

use crate::RelativeAddress;

/// Display hint for an [`Operand::Imm`] literal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum NumberDisplay {
    /// Decimal.
    Dec,
    /// Hexadecimal.
    Hex,
    /// Octal.
    Oct,
    /// Binary.
    Bin,
    /// String (the literal is itself a resolved string reference).
    Str,
}

/// A value paired with how it should be rendered.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DisplayValue {
    /// The raw value.
    pub val: i64,
    /// Rendering hint.
    pub disp: NumberDisplay,
}

/// A floating-point literal operand.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FpOperand {
    /// The floating-point value.
    pub val: f64,
    /// Rendering hint, carried for symmetry with [`DisplayValue`] even though
    /// floats are always rendered the same way.
    pub disp: NumberDisplay,
}

/// A memory-reference operand: `[base + index*scale + disp]`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MemOperand {
    /// Base register name, if any.
    pub base_reg: Option<String>,
    /// Index register name; `None` encodes "no index".
    pub index_reg: Option<String>,
    /// Displacement.
    pub rel: DisplayValue,
    /// Scale factor.
    pub scale: DisplayValue,
}

/// The value carried by an [`Operand`], tagged by kind.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum OperandValue {
    /// Floating-point literal.
    Fp(FpOperand),
    /// Integer literal.
    Imm(DisplayValue),
    /// Memory reference.
    Mem(MemOperand),
    /// Register name.
    Reg(String),
    /// Invalid or unrecognized operand.
    Invalid,
}

/// A fully decoded operand: the tagged value plus the fields common to every
/// operand kind.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Operand {
    /// The tagged operand value.
    pub value: OperandValue,
    /// Raw textual form as produced by the decoder.
    pub op_str: String,
    /// Whether this is the final operand of the instruction.
    pub last: bool,
    /// A resolved cross-reference, set by the xref parser once the operand's
    /// candidate address has been matched to a [`crate::Location`].
    pub xref: Option<crate::LocationId>,
}

impl Operand {
    /// Build a new operand with no resolved xref yet.
    pub fn new(value: OperandValue, op_str: impl Into<String>, last: bool) -> Self {
        Self { value, op_str: op_str.into(), last, xref: None }
    }

    /// Candidate address for the cross-reference parser, if this operand kind
    /// can carry one: `fp`/`imm` literals, and `mem` with no index register.
    pub fn xref_candidate(&self) -> Option<i64> {
        if self.xref.is_some() {
            return None;
        }

        match &self.value {
            OperandValue::Fp(fp) => Some(fp.val as i64),
            OperandValue::Imm(imm) => Some(imm.val),
            OperandValue::Mem(mem) if mem.index_reg.is_none() => Some(mem.rel.val),
            OperandValue::Mem(_) | OperandValue::Reg(_) | OperandValue::Invalid => None,
        }
    }
}

/// Identity of a persisted [`crate::Location`], handed back by the store once
/// the location has been inserted or upserted.
pub type LocationId = RelativeAddress;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_xref_candidate_imm() {
        let operand =
            Operand::new(OperandValue::Imm(DisplayValue { val: 0x3000, disp: NumberDisplay::Hex }), "0x3000", true);

        assert_eq!(operand.xref_candidate(), Some(0x3000));
    }

    #[test]
    fn test_xref_candidate_mem_indexed_has_no_candidate() {
        let operand = Operand::new(
            OperandValue::Mem(MemOperand {
                base_reg: Some("rax".to_string()),
                index_reg: Some("rbx".to_string()),
                rel: DisplayValue { val: 8, disp: NumberDisplay::Dec },
                scale: DisplayValue { val: 1, disp: NumberDisplay::Dec },
            }),
            "[rax+rbx*1+8]",
            true,
        );

        assert_eq!(operand.xref_candidate(), None);
    }

    #[test]
    fn test_xref_candidate_already_resolved() {
        let mut operand =
            Operand::new(OperandValue::Imm(DisplayValue { val: 0x3000, disp: NumberDisplay::Hex }), "0x3000", true);
        operand.xref = Some(0);

        assert_eq!(operand.xref_candidate(), None);
    }
}
