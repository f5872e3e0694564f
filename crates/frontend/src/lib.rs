//! `haevn-frontend` adapts a binary file into the [`BinaryFrontend`]
//! capability set: format detection, section enumeration, and
//! architecture/mode/entry-point extraction.
//!
//! The concrete bit-level parsing is delegated to `haevn-object`; this crate
//! only translates its types into the shared data model of `haevn-core` and
//! never leaks `haevn-object` types past its own API.

#![deny(unused)]
#![deny(warnings)]
#![deny(missing_docs)]
#![deny(clippy::all)]
#![deny(rustdoc::broken_intra_doc_links)]
#![deny(rustdoc::private_intra_doc_links)]
#![deny(rustdoc::missing_crate_level_docs)]
#![deny(rustdoc::invalid_codeblock_attributes)]
#![deny(rustdoc::invalid_rust_codeblocks)]

mod elf;
mod error;

pub use elf::ElfFrontend;
pub use error::Error;

use haevn_core::{AbsoluteAddress, Arch, Format, Mode, Section};

/// Capability set required of every binary-format front-end.
///
/// A front-end owns the binary file handle for its whole lifetime and is
/// expected to have already parsed every section at construction time: all
/// accessors here are infallible and non-blocking.
pub trait BinaryFrontend {
    /// The container format identified for this binary.
    fn format(&self) -> Format;

    /// The instruction set architecture, or `None` if it could not be
    /// mapped.
    fn arch(&self) -> Option<Arch>;

    /// The word size/endianness tag, or `None` alongside [`Self::arch`].
    fn mode(&self) -> Option<Mode>;

    /// MD5 digest of the binary file's contents.
    fn md5(&self) -> [u8; 16];

    /// Size, in bytes, of the binary file.
    fn size(&self) -> u64;

    /// Absolute entry point address, if the format records one.
    fn entry_point(&self) -> Option<AbsoluteAddress>;

    /// All sections, in the order the format lists them.
    fn sections(&self) -> &[Section];

    /// Sections marked executable.
    fn executable_sections(&self) -> Vec<&Section> {
        self.sections().iter().filter(|section| section.is_executable()).collect()
    }

    /// Sections not marked executable.
    fn non_executable_sections(&self) -> Vec<&Section> {
        self.sections().iter().filter(|section| !section.is_executable()).collect()
    }
}
