use haevn_errors::error;

error! {
    /// Fatal errors raised while running a disassembly strategy. Everything
    /// else the strategies encounter — a decode stall, an unresolvable
    /// branch target — is recovered locally and only ever observed as a
    /// `tracing` event.
    pub enum Error {
        #[code = E014]
        #[message = "The configured disassembler strategy is not registered."]
        #[formatted_message("unknown disassembler strategy: `{0}`")]
        #[help = "Valid values for `Disassembler.strategy` are `linear` and `recursive`."]
        UnknownStrategy(String),

        #[transparent]
        Decoder(#[from] capstone::Error),

        #[transparent]
        Store(#[from] haevn_storage::Error),
    }
}
