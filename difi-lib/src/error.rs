#[derive(thiserror::Error, Debug)]
#[non_exhaustive]
pub enum Error {
    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error("Invalid config: {0}")]
    Config(String),

    /// A context packet declared a sample bit depth other than the configured one.
    #[error("context packet bit depth {declared} does not match configured bit depth {configured}")]
    BitDepthMismatch { declared: u8, configured: u8 },

    /// A context packet length that matches neither supported DIFI layout.
    #[error("context packet length {0} is not 72 or 108 bytes")]
    ContextLength(usize),

    /// The engine stopped on a fatal protocol error and must be rebuilt.
    #[error("engine halted after a fatal protocol error")]
    Halted,
}

impl Error {
    /// True for protocol errors that terminate an [crate::Engine].
    #[must_use]
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            Error::BitDepthMismatch { .. } | Error::ContextLength(_) | Error::Halted
        )
    }
}

pub type Result<T> = std::result::Result<T, Error>;
