use haevn_errors::error;

error! {
    /// Fatal storage errors: batch write failures that the calling worker
    /// cannot recover from locally.
    pub enum Error {
        #[code = E016]
        #[message = "A batch write to the store failed."]
        #[formatted_message("batch write to the store failed: {0}")]
        #[help = "Check the database directory is writable and has free space."]
        Transient(#[from] sled::Error),

        #[code = E016]
        #[message = "A record could not be encoded or decoded."]
        #[formatted_message("record (de)serialization failed: {0}")]
        #[help = "This usually means the on-disk database is from an incompatible version."]
        Encoding(#[from] bincode::Error),
    }
}
