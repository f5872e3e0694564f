use enumflags2::BitFlags;
use serde::{Deserialize, Serialize};

use crate::{AbsoluteAddress, Attribute, RelativeAddress};

/// Discriminant of a [`Label`], mirroring the `kind` field of the abstract
/// parent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum LabelKind {
    /// A function.
    Func,
    /// A string.
    Str,
    /// A section.
    Sec,
    /// An arbitrary code location.
    Loc,
}

/// A local variable belonging to a [`Function`] label.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LocalVariable {
    /// Name of the local variable.
    pub name: String,
    /// Offset of the variable relative to the function's frame base.
    pub frame_offset: i64,
}

/// A function, spanning `[r_start_addr, r_end_addr)` within a section.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Function {
    /// Name of the function.
    pub name: String,
    /// Relative start address, inclusive.
    pub r_start_addr: RelativeAddress,
    /// Relative end address, exclusive.
    pub r_end_addr: RelativeAddress,
    /// Name of the containing section.
    pub sec_name: String,
    /// Local variables, if known.
    pub l_vars: Option<Vec<LocalVariable>>,
}

/// A string discovered by the string parser.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StringLabel {
    /// Name of the label; conventionally the string's own content.
    pub name: String,
    /// Relative address of the first byte of the string.
    pub r_addr: RelativeAddress,
    /// Name of the containing section.
    pub sec_name: String,
    /// Content bytes, including the trailing NUL; matches the bytes of the
    /// backing data instruction at `r_addr`.
    pub contents: Vec<u8>,
}

/// A section, mirrored into the label space so labels form a uniform,
/// queryable collection regardless of kind.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SectionLabel {
    /// Name of the section.
    pub name: String,
    /// Absolute base address, duplicated from [`crate::Section::base_addr`].
    pub base_addr: AbsoluteAddress,
    /// Size in bytes, duplicated from [`crate::Section::size`].
    pub size: u64,
    /// Raw bytes, duplicated from [`crate::Section::bytes`].
    pub data: Vec<u8>,
    /// Attributes, duplicated from [`crate::Section::attributes`].
    pub attribs: BitFlags<Attribute>,
}

/// An arbitrary labelled code location, e.g. the target of a resolved xref
/// or a basic-block start. Conventionally named `loc_<8-hex-absaddr>`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Location {
    /// Name of the location, conventionally `loc_%08x` of the absolute
    /// address.
    pub name: String,
    /// Relative address within the section.
    pub r_addr: RelativeAddress,
    /// Name of the containing section.
    pub sec_name: String,
}

impl Location {
    /// Build the conventional name for a location at the given absolute
    /// address: `loc_%08x`.
    pub fn conventional_name(abs_addr: AbsoluteAddress) -> String {
        format!("loc_{abs_addr:08x}")
    }
}

/// A symbolic name anchored at an address: a function, a string, a section,
/// or an arbitrary location.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Label {
    /// See [`Function`].
    Function(Function),
    /// See [`StringLabel`].
    String(StringLabel),
    /// See [`SectionLabel`].
    Section(SectionLabel),
    /// See [`Location`].
    Location(Location),
}

impl Label {
    /// The label's name, regardless of kind.
    pub fn name(&self) -> &str {
        match self {
            Self::Function(label) => &label.name,
            Self::String(label) => &label.name,
            Self::Section(label) => &label.name,
            Self::Location(label) => &label.name,
        }
    }

    /// The label's kind.
    pub fn kind(&self) -> LabelKind {
        match self {
            Self::Function(_) => LabelKind::Func,
            Self::String(_) => LabelKind::Str,
            Self::Section(_) => LabelKind::Sec,
            Self::Location(_) => LabelKind::Loc,
        }
    }

    /// The upsert key for this label, per kind: `r_addr` for loc/str,
    /// `base_addr` for sec, `r_start_addr` for func.
    pub fn upsert_key(&self) -> u64 {
        match self {
            Self::Function(label) => label.r_start_addr,
            Self::String(label) => label.r_addr,
            Self::Section(label) => label.base_addr,
            Self::Location(label) => label.r_addr,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_location_conventional_name() {
        assert_eq!(Location::conventional_name(0x3000), "loc_00003000");
    }

    #[test]
    fn test_label_kind_and_key() {
        let label = Label::Location(Location {
            name: "loc_00001000".to_string(),
            r_addr: 0x10,
            sec_name: ".text".to_string(),
        });

        assert_eq!(label.kind(), LabelKind::Loc);
        assert_eq!(label.upsert_key(), 0x10);
        assert_eq!(label.name(), "loc_00001000");
    }
}
