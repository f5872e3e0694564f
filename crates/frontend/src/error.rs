use haevn_errors::error;

error! {
    /// Fatal errors raised while opening and reading a binary file.
    ///
    /// Format/architecture detection failures are *not* modeled here: an
    /// unrecognized format yields an empty section list and `None`
    /// arch/mode, not an error. Only I/O failures at the file-handle level
    /// are fatal.
    pub enum Error {
        #[code = E010]
        #[message = "I failed to open or read the binary file."]
        #[formatted_message("failed to open or read the binary file: {0}")]
        #[help = "Check the path exists and is readable."]
        Io(#[from] std::io::Error),
    }
}
