//! `haevn-strategies` implements the two disassembly strategies: `linear`, a
//! straight-line byte-by-byte sweep, and `recursive`, a control-flow-following
//! walk seeded from a set of entry points. Both share the same visited-bitmap
//! protocol and work-queue discipline.

#![deny(unused)]
#![deny(warnings)]
#![deny(missing_docs)]
#![deny(clippy::all)]
#![deny(rustdoc::broken_intra_doc_links)]
#![deny(rustdoc::private_intra_doc_links)]
#![deny(rustdoc::missing_crate_level_docs)]
#![deny(rustdoc::invalid_codeblock_attributes)]
#![deny(rustdoc::invalid_rust_codeblocks)]

mod bitmap;
mod common;
mod error;
mod linear;
mod recursive;

pub use error::Error;
use haevn_core::{AbsoluteAddress, Arch, Mode};
use haevn_storage::Store;

/// The disassembler strategy named by `Disassembler.strategy`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StrategyKind {
    /// Straight-line, byte-by-byte sweep.
    Linear,
    /// Control-flow-following walk seeded from entry points.
    Recursive,
}

impl StrategyKind {
    /// Parse a `Disassembler.strategy` config value. Case-sensitive:
    /// `"linear"` or `"recursive"`.
    pub fn parse(name: &str) -> Result<Self, Error> {
        match name {
            "linear" => Ok(Self::Linear),
            "recursive" => Ok(Self::Recursive),
            other => Err(Error::UnknownStrategy(other.to_string())),
        }
    }
}

/// Run `kind` over every section of the current disassembly in `store`.
///
/// `entry_points` and `num_procs` only matter to the recursive strategy;
/// `single_threaded` forces either strategy onto the calling thread
/// (`Debugging.disable_multiprocessing`).
#[allow(clippy::too_many_arguments)]
pub fn run(
    kind: StrategyKind,
    store: &dyn Store,
    arch: Arch,
    mode: Mode,
    entry_points: &[AbsoluteAddress],
    num_procs: usize,
    single_threaded: bool,
) -> Result<(), Error> {
    match kind {
        StrategyKind::Linear => linear::run(store, arch, mode, single_threaded),
        StrategyKind::Recursive => {
            recursive::run(store, arch, mode, entry_points, num_procs, single_threaded)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_accepts_known_strategies() {
        assert_eq!(StrategyKind::parse("linear").unwrap(), StrategyKind::Linear);
        assert_eq!(StrategyKind::parse("recursive").unwrap(), StrategyKind::Recursive);
    }

    #[test]
    fn test_parse_rejects_unknown_strategy() {
        let err = StrategyKind::parse("bogus").unwrap_err();
        assert!(matches!(err, Error::UnknownStrategy(name) if name == "bogus"));
    }
}
