use serde::{Deserialize, Serialize};

use crate::RelativeAddress;

/// A directed relation from a referencing instruction to a labelled
/// [`crate::Location`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Xref {
    /// Relative address of the referencing instruction.
    pub base_addr: RelativeAddress,
    /// Name of the section containing the referencing instruction.
    pub base_sec_name: String,
    /// Relative address of the referenced [`crate::Location`].
    pub ref_addr: RelativeAddress,
    /// Name of the section containing the referenced location.
    pub ref_sec_name: String,
}

impl Xref {
    /// Build a new xref from a `(base_addr, base_sec_name)` source to a
    /// `(ref_addr, ref_sec_name)` target.
    pub fn new(
        base_addr: RelativeAddress,
        base_sec_name: impl Into<String>,
        ref_addr: RelativeAddress,
        ref_sec_name: impl Into<String>,
    ) -> Self {
        Self {
            base_addr,
            base_sec_name: base_sec_name.into(),
            ref_addr,
            ref_sec_name: ref_sec_name.into(),
        }
    }
}
