#[cfg(feature = "fancy-errors")]
use miette::{set_hook, MietteHandlerOpts};
use miette::InstallError;

use haevn_errors::error;
use haevn_errors::Error as HaevnError;

error! {
    /// Fatal errors raised by the `haevn` binary itself: argument parsing,
    /// front-end detection failures the pipeline cannot recover from, and
    /// anything propagated up from a lower crate's own `Error` type.
    pub enum Error {
        #[message = "The argument contains invalid Unicode data."]
        #[formatted_message("the argument `{0}` contains invalid Unicode data")]
        #[help = "Re-run with valid UTF-8 arguments."]
        InvalidArgumentEncoding(String),

        #[message = "The program name is missing from the command-line."]
        #[help = "This should not happen under a normal shell invocation."]
        ProgramNameIsMissing,

        #[code = E017]
        #[message = "I was not able to read the command-line properly."]
        #[formatted_message("I was not able to read the command-line properly:\n{0}")]
        #[help = "See the command-line usage with `haevn --help`."]
        CommandLine(String),

        #[code = E012]
        #[message = "The binary's container format could not be identified."]
        #[formatted_message("the container format of `{0}` could not be identified")]
        #[help = "Only ELF is fully supported; PE and Mach-O are recognized but not decoded."]
        UnknownFormat(String),

        #[code = E013]
        #[message = "The binary's architecture could not be mapped to a supported decoder."]
        #[formatted_message("the architecture of `{0}` is not supported")]
        #[help = "Supported architectures are x86, arm, arm64, mips, and ppc."]
        UnknownArchitecture(String),

        #[code = E011]
        #[message = "A disassembly with this name already exists in the project."]
        #[formatted_message("a disassembly named `{0}` already exists in project `{1}`")]
        #[help = "Pick a different `-d <disassembly>` name, or inspect the existing one."]
        DuplicateDisassembly(String, String),

        #[code = E015]
        #[message = "The project has no recorded information."]
        #[formatted_message("project `{0}` has no recorded information")]
        #[help = "`-s` requires a project already populated by a prior `-f` run."]
        NoProjectInfo(String),

        #[transparent]
        Frontend(#[from] haevn_frontend::Error),

        #[transparent]
        Storage(#[from] haevn_storage::Error),

        #[transparent]
        Strategies(#[from] haevn_strategies::Error),
    }
}

impl Error {
    pub(crate) fn install_and_configure() -> Result<(), InstallError> {
        #[cfg(feature = "fancy-errors")]
        set_hook(Box::new(|_| {
            Box::new(
                MietteHandlerOpts::new()
                    .with_cause_chain()
                    .footer(
                        "For more information about an error, try \
                        `haevn --explain <error>` where `<error>` \
                        has the `E[0-9]{{3}} pattern."
                            .to_string(),
                    )
                    .width(85)
                    .terminal_links(false)
                    .build(),
            )
        }))?;

        Ok(())
    }

    pub(crate) fn explain(error_code: &str) -> Result<&'static str, HaevnError> {
        HaevnError::explain(error_code)
    }
}
