//! `haevn-storage` is the persistence abstraction: a single object scoped to
//! `(project, disassembly)` exposing section/instruction/label/xref CRUD,
//! backed either by [`memory::MemoryStore`] (used by every unit test in
//! this workspace) or by [`sled_store::SledStore`] (the production
//! backend).
//!
//! The global "memoize" decorators of the original tool become plain memo
//! maps owned by each `Store` implementation; their lifetime matches the
//! store's own.

#![deny(unused)]
#![deny(warnings)]
#![deny(missing_docs)]
#![deny(clippy::all)]
#![deny(rustdoc::broken_intra_doc_links)]
#![deny(rustdoc::private_intra_doc_links)]
#![deny(rustdoc::missing_crate_level_docs)]
#![deny(rustdoc::invalid_codeblock_attributes)]
#![deny(rustdoc::invalid_rust_codeblocks)]

mod error;
mod memory;
mod sled_store;

use std::ops::Range;

pub use error::Error;
use haevn_core::{
    AbsoluteAddress, Disassembly, Function, Instruction, Label, Location, LocationId,
    RelativeAddress, Section, StringLabel, Xref,
};
pub use memory::MemoryStore;
pub use sled_store::SledStore;

/// Persistence operations scoped to `(project, disassembly)`.
///
/// A `Store` is stateful: [`Store::load_project`] and
/// [`Store::add_disassembly`] select the project/disassembly every other
/// method operates against, mirroring the original tool's scoped database
/// manager. Every method takes `&self` rather than `&mut self` so a single
/// store handle can be cloned and shared across the worker threads of the
/// recursive strategy, each opening its own store connection on first use.
pub trait Store: Send + Sync {
    /// Create the project record if absent, and make it the current
    /// project for every subsequent call. Memoized by name.
    fn load_project(&self, name: &str) -> Result<(), Error>;

    /// Persist `disassembly` under the current project and make it the
    /// current disassembly. Returns `false` without mutating state if a
    /// disassembly of that name already exists in the project.
    fn add_disassembly(&self, disassembly: Disassembly) -> Result<bool, Error>;

    /// Insert a new section, keyed by `base_addr`.
    fn add_section(&self, section: Section) -> Result<(), Error>;

    /// Insert or replace a section, keyed by `base_addr`.
    fn upsert_section(&self, section: Section) -> Result<(), Error>;

    /// Bulk-insert instructions into `sec_name`. Stored so that
    /// [`Store::get_instructions`] later returns them address-ascending.
    fn batch_add_instructions(
        &self,
        sec_name: &str,
        instructions: Vec<Instruction>,
    ) -> Result<(), Error>;

    /// Insert (or, if `update`, replace) a single instruction in
    /// `sec_name`, keyed by its relative address.
    fn add_instruction(&self, sec_name: &str, instruction: Instruction, update: bool) -> Result<(), Error>;

    /// Delete every instruction in `sec_name` whose relative address falls
    /// in any of the given half-open ranges. Used by the string parser to
    /// replace a run of bytes with its collapsed data instruction.
    fn batch_delete_insts_in_addr_ranges(
        &self,
        sec_name: &str,
        ranges: &[Range<RelativeAddress>],
    ) -> Result<(), Error>;

    /// Insert a new label, keyed per [`haevn_core::Label::upsert_key`]
    /// (scoped additionally by section name, since `r_addr`/`base_addr`
    /// alone are only unique within a section).
    fn add_label(&self, label: Label) -> Result<(), Error>;

    /// Insert or replace a label, same keying as [`Store::add_label`].
    /// Returns the persisted label's key, which callers use to fill in an
    /// operand's `xref` field.
    fn upsert_label(&self, label: Label) -> Result<LocationId, Error>;

    /// Insert a cross-reference.
    fn add_xref(&self, xref: Xref) -> Result<(), Error>;

    /// Sections, optionally filtered by executability.
    fn get_sections(&self, executable: Option<bool>) -> Result<Vec<Section>, Error>;

    /// A single section by name.
    fn get_section(&self, name: &str) -> Result<Option<Section>, Error>;

    /// The section whose address range contains `addr`, if any. Memoized by
    /// address.
    fn get_section_containing_addr(&self, addr: AbsoluteAddress) -> Result<Option<Section>, Error>;

    /// Every `Function` label.
    fn get_functions(&self) -> Result<Vec<Function>, Error>;

    /// Every `String` label.
    fn get_strings(&self) -> Result<Vec<StringLabel>, Error>;

    /// Every `Location` label.
    fn get_locations(&self) -> Result<Vec<Location>, Error>;

    /// Instructions in `sec_name`, ascending by absolute address.
    fn get_instructions(&self, sec_name: &str) -> Result<Vec<Instruction>, Error>;

    /// Count of instructions in `sec_name`.
    fn get_instructions_count(&self, sec_name: &str) -> Result<usize, Error>;
}
