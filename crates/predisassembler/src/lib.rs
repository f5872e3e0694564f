//! `haevn-predisassembler` seeds additional disassembly entry points from
//! format-specific conventions.

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

use haevn_core::{AbsoluteAddress, Format};
use haevn_frontend::BinaryFrontend;

/// Seed additional entry points beyond the front-end's own `entry_point()`.
///
/// For ELF, this looks for the `main`-argument convention described in
/// [`elf::run`]. For every other format, no extra entry points are produced.
pub fn run(frontend: &dyn BinaryFrontend) -> Vec<AbsoluteAddress> {
    match frontend.format() {
        Format::Elf => elf::run(frontend),
        Format::Pe | Format::MachO => Vec::new(),
    }
}
