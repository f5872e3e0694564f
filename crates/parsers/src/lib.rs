//! Post-decode parsers that run once a disassembly strategy has fully
//! completed: string discovery over non-executable sections, and
//! cross-reference resolution over every decoded operand.
//!
//! Both parsers read and rewrite through the [`haevn_storage::Store`]
//! abstraction only; neither touches a decoder or a binary file directly.

#![deny(unused)]
#![deny(warnings)]
#![deny(missing_docs)]
#![deny(clippy::all)]
#![deny(rustdoc::broken_intra_doc_links)]
#![deny(rustdoc::private_intra_doc_links)]
#![deny(rustdoc::missing_crate_level_docs)]
#![deny(rustdoc::invalid_codeblock_attributes)]
#![deny(rustdoc::invalid_rust_codeblocks)]

mod string;
mod xref;

pub use string::run as run_string_parser;
pub use xref::run as run_xref_parser;
