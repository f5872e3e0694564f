//! `haevn-bin` is the executable of `haevn`.
//!
//! This crate wires together the binary front-end, the predisassembler, a
//! disassembly strategy, and the post-decode parsers into a single CLI.

mod error;

use std::{
    env,
    ffi::OsString,
    path::{Path, PathBuf},
    process,
};

use argh::FromArgs;
use error::Error;
use haevn_config::Config;
use haevn_core::Disassembly;
use haevn_errors::Result;
use haevn_frontend::{BinaryFrontend, ElfFrontend};
use haevn_storage::{SledStore, Store};
use haevn_strategies::StrategyKind;

fn default_config_path() -> PathBuf {
    PathBuf::from(haevn_config::DEFAULT_CONFIG_FILE_NAME)
}

/// `haevn` disassembles a binary, or extends an existing disassembly, into
/// the instruction/label/xref store.
#[derive(Debug, FromArgs)]
struct Haevn {
    /// explain a particular error based on its code (of kind `E...`).
    #[argh(option)]
    explain: Option<String>,

    /// project name. Created if absent.
    #[argh(option, short = 'p')]
    project: Option<String>,

    /// disassembly name, unique within the project.
    #[argh(option, short = 'd')]
    disassembly: Option<String>,

    /// path to a binary file; creates a new disassembly. Mutually exclusive
    /// with `-s`.
    #[argh(option, short = 'f')]
    file: Option<PathBuf>,

    /// instruction identities to re-disassemble within an existing
    /// disassembly (reserved; data-to-text conversion is not yet
    /// implemented). Mutually exclusive with `-f`.
    #[argh(option, short = 's')]
    instruction_ids: Vec<String>,

    /// path to the TOML configuration file.
    #[argh(option, short = 'c', default = "default_config_path()")]
    config: PathBuf,
}

impl Haevn {
    /// Creates a new `Self` type based on [`std::env::args_os`].
    fn new() -> Result<Self, Error> {
        // Collect all arguments.
        let arguments =
            env::args_os().map(OsString::into_string).collect::<Result<Vec<_>, _>>().map_err(
                |argument| Error::InvalidArgumentEncoding(argument.to_string_lossy().to_string()),
            )?;

        // Check whether `argv` is present.
        if arguments.is_empty() {
            return Err(Error::ProgramNameIsMissing);
        }

        // Extract the base command from a path.
        let command = Path::new(&arguments[0])
            .file_name()
            .and_then(|file_name| file_name.to_str())
            .unwrap_or(&arguments[0]);

        // Extract all arguments.
        let arguments =
            arguments.iter().skip(1).map(|argument| argument.as_str()).collect::<Vec<_>>();

        // Parse and build `Self`.
        match Haevn::from_args(&[command], &arguments) {
            Ok(haevn) => Ok(haevn),
            Err(early_exit) => match early_exit.status {
                // The command was parsed successfully and the early exit is due to a flag like
                // `--help` causing early exit with output.
                Ok(()) => {
                    println!("{}", early_exit.output);

                    process::exit(0);
                }

                // The arguments were not successfully parsed.
                Err(()) => Err(Error::CommandLine(early_exit.output.trim().to_string())),
            },
        }
    }
}

/// Install a `tracing-subscriber` `fmt` layer, honoring `RUST_LOG` when set.
/// `log_path` is accepted for configuration round-tripping but is not yet
/// wired to a file appender; logs always go to stderr.
fn install_tracing(log_path: &str) {
    use tracing_subscriber::EnvFilter;

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::fmt().with_env_filter(filter).with_writer(std::io::stderr).init();

    if !log_path.is_empty() {
        tracing::debug!(log_path, "Debugging.log_path is set but file logging is not wired up");
    }
}

/// Create the disassembly named `haevn.disassembly` in `store`, running the
/// full pipeline: front-end → predisassembler → strategy → parsers.
fn run_new_disassembly(
    haevn: &Haevn,
    config: &Config,
    store: &dyn Store,
) -> Result<(), Error> {
    let project_name = haevn.project.as_deref().expect("checked by run()");
    let disassembly_name = haevn.disassembly.as_deref().expect("checked by run()");
    let file = haevn.file.as_deref().expect("checked by run()");

    let frontend = ElfFrontend::open(file)?;
    let file_name = file.display().to_string();

    let (arch, mode) = match (frontend.arch(), frontend.mode()) {
        (Some(arch), Some(mode)) => (arch, mode),
        _ if frontend.sections().is_empty() => return Err(Error::UnknownFormat(file_name)),
        _ => return Err(Error::UnknownArchitecture(file_name)),
    };

    store.load_project(project_name)?;

    let disassembly = Disassembly {
        name: disassembly_name.to_string(),
        binary_name: file_name.clone(),
        format: frontend.format(),
        arch,
        mode,
        md5: frontend.md5(),
        size: frontend.size(),
        entry_point: frontend.entry_point().unwrap_or(0),
    };

    if !store.add_disassembly(disassembly)? {
        return Err(Error::DuplicateDisassembly(
            disassembly_name.to_string(),
            project_name.to_string(),
        ));
    }

    for section in frontend.sections() {
        store.add_section(section.clone())?;
    }

    let mut entry_points = haevn_predisassembler::run(&frontend);

    if let Some(entry_point) = frontend.entry_point() {
        entry_points.push(entry_point);
    }

    let strategy = StrategyKind::parse(&config.disassembler.strategy)?;

    haevn_strategies::run(
        strategy,
        store,
        arch,
        mode,
        &entry_points,
        config.general.num_procs,
        config.debugging.disable_multiprocessing,
    )?;

    if !config.debugging.disable_parsers {
        haevn_parsers::run_string_parser(store, config.string_parser.min_string_length)?;
        haevn_parsers::run_xref_parser(store)?;
    }

    tracing::info!(project = project_name, disassembly = disassembly_name, %file_name, "disassembly complete");

    Ok(())
}

fn run(haevn: &Haevn) -> Result<(), Error> {
    let config = Config::load(&haevn.config);
    install_tracing(&config.debugging.log_path);

    let store = SledStore::open(&config.database.host)?;

    let project_name = haevn.project.as_deref().ok_or_else(|| {
        Error::CommandLine("`-p/--project` is required.".to_string())
    })?;
    let disassembly_name = haevn.disassembly.as_deref().ok_or_else(|| {
        Error::CommandLine("`-d/--disassembly` is required.".to_string())
    })?;

    match (&haevn.file, haevn.instruction_ids.is_empty()) {
        (Some(_), true) => run_new_disassembly(haevn, &config, &store),
        (None, false) => {
            // Reserved: data-to-text conversion over an existing
            // disassembly is not implemented yet.
            store.load_project(project_name)?;

            Err(Error::NoProjectInfo(format!("{project_name}/{disassembly_name}")))
        }
        (Some(_), false) | (None, true) => Err(Error::CommandLine(
            "exactly one of `-f <file>` or `-s <id>...` must be given.".to_string(),
        )),
    }
}

fn main() -> Result<()> {
    // Install the error report.
    Error::install_and_configure()?;

    // Build the command-line arguments.
    let haevn = Haevn::new()?;

    // Handle the `--explain` option.
    if let Some(error_code) = haevn.explain {
        println!("{}", Error::explain(&error_code)?);

        return Ok(());
    }

    run(&haevn)?;

    Ok(())
}
