//! `haevn-config` loads the TOML configuration document: five tables, every
//! key defaulted, so an absent file or a partially-populated one is never
//! fatal.

#![deny(unused)]
#![deny(warnings)]
#![deny(missing_docs)]
#![deny(clippy::all)]
#![deny(rustdoc::broken_intra_doc_links)]
#![deny(rustdoc::private_intra_doc_links)]
#![deny(rustdoc::missing_crate_level_docs)]
#![deny(rustdoc::invalid_codeblock_attributes)]
#![deny(rustdoc::invalid_rust_codeblocks)]

use std::path::Path;

use serde::{Deserialize, Serialize};

/// The name the CLI looks for in the working directory when `-c/--config`
/// is not given.
pub const DEFAULT_CONFIG_FILE_NAME: &str = "haevn.toml";

/// `[database]`: the embedded store's on-disk location. `host`/`port` are
/// repurposed since `sled` has no network listener: `host` becomes the
/// database directory, `port` becomes an open-files cache-capacity hint.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Database {
    /// On-disk directory for the `sled` database.
    pub host: String,
    /// Cache-capacity hint, in number of open files.
    pub port: u16,
}

impl Default for Database {
    fn default() -> Self {
        Self { host: "haevn.db".to_string(), port: 1024 }
    }
}

/// `[disassembler]`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Disassembler {
    /// Strategy name: `"linear"` or `"recursive"`.
    pub strategy: String,
}

impl Default for Disassembler {
    fn default() -> Self {
        Self { strategy: "recursive".to_string() }
    }
}

/// `[string_parser]`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StringParser {
    /// Minimum string length `L` the string parser's regular expression
    /// requires (default 5).
    pub min_string_length: usize,
}

impl Default for StringParser {
    fn default() -> Self {
        Self { min_string_length: 5 }
    }
}

/// `[general]`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct General {
    /// Degree of parallelism for the recursive strategy's worker pool.
    pub num_procs: usize,
}

impl Default for General {
    fn default() -> Self {
        Self { num_procs: 4 }
    }
}

/// `[debugging]`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Debugging {
    /// Force single-threaded execution, ignoring `General.num_procs`.
    pub disable_multiprocessing: bool,
    /// Skip the string and xref parsers entirely.
    pub disable_parsers: bool,
    /// External concern; carried through so the config document round-trips.
    pub profiler_on: bool,
    /// External concern; path the `tracing-subscriber` layer writes to, if
    /// any. Empty means "log to stderr".
    pub log_path: String,
}

impl Default for Debugging {
    fn default() -> Self {
        Self {
            disable_multiprocessing: false,
            disable_parsers: false,
            profiler_on: false,
            log_path: String::new(),
        }
    }
}

/// The full configuration tree, one field per TOML table.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// `[database]`.
    pub database: Database,
    /// `[disassembler]`.
    pub disassembler: Disassembler,
    /// `[string_parser]`.
    pub string_parser: StringParser,
    /// `[general]`.
    pub general: General,
    /// `[debugging]`.
    pub debugging: Debugging,
}

impl Config {
    /// Load the configuration from `path`. Falls back to
    /// [`Config::default`] entirely when the file does not exist, and to
    /// per-field defaults when the file exists but is only partially
    /// populated (any key present in the document wins, everything else is
    /// defaulted by `serde`).
    pub fn load(path: impl AsRef<Path>) -> Self {
        let path = path.as_ref();

        let contents = match std::fs::read_to_string(path) {
            Ok(contents) => contents,
            Err(error) => {
                tracing::debug!(path = %path.display(), %error, "no config file, using defaults");

                return Self::default();
            }
        };

        match toml::from_str(&contents) {
            Ok(config) => config,
            Err(error) => {
                tracing::warn!(path = %path.display(), %error, "config file failed to parse, using defaults");

                Self::default()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = Config::default();

        assert_eq!(config.disassembler.strategy, "recursive");
        assert_eq!(config.string_parser.min_string_length, 5);
        assert_eq!(config.general.num_procs, 4);
        assert!(!config.debugging.disable_multiprocessing);
    }

    #[test]
    fn test_load_missing_file_falls_back_to_defaults() {
        let config = Config::load("/nonexistent/path/to/haevn.toml");

        assert_eq!(config, Config::default());
    }

    #[test]
    fn test_partial_document_keeps_other_defaults() {
        let document = r#"
            [disassembler]
            strategy = "linear"

            [string_parser]
            min_string_length = 8
        "#;

        let config: Config = toml::from_str(document).unwrap();

        assert_eq!(config.disassembler.strategy, "linear");
        assert_eq!(config.string_parser.min_string_length, 8);
        assert_eq!(config.general.num_procs, 4);
        assert_eq!(config.database.host, "haevn.db");
    }
}
