use thiserror::Error;

/// Errors raised while reading or rewriting box structures.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum Mp4Error {
    /// A box invariant was violated: bad size, truncated payload, missing child, etc.
    #[error("malformed container: {0}")]
    Malformed(String),

    /// The input is well formed but uses a feature this library does not handle.
    #[error("unsupported container feature: {0}")]
    Unsupported(String),
}

impl Mp4Error {
    pub fn malformed(msg: impl Into<String>) -> Self {
        Self::Malformed(msg.into())
    }

    pub fn unsupported(msg: impl Into<String>) -> Self {
        Self::Unsupported(msg.into())
    }
}

pub type Result<T> = std::result::Result<T, Mp4Error>;
