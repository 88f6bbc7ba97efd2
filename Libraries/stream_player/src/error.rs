use mp4_box::Mp4Error;
use thiserror::Error;

/// Errors surfaced by the streaming client.
///
/// Container and manifest errors are raised synchronously by the parsers. Transport errors
/// arrive through the completion path of a request. Neither kind advances a track, so the next
/// tick retries the same work.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum PlayerError {
    #[error("manifest parse error: {0}")]
    ManifestParse(String),

    #[error("malformed container: {0}")]
    MalformedContainer(String),

    #[error("transport error: {0}")]
    Transport(String),

    #[error("unsupported feature: {0}")]
    UnsupportedFeature(String),

    #[error("invalid configuration: {0}")]
    Config(String),
}

impl PlayerError {
    pub fn manifest(msg: impl Into<String>) -> Self {
        Self::ManifestParse(msg.into())
    }

    pub fn transport(msg: impl Into<String>) -> Self {
        Self::Transport(msg.into())
    }

    pub fn unsupported(msg: impl Into<String>) -> Self {
        Self::UnsupportedFeature(msg.into())
    }
}

impl From<Mp4Error> for PlayerError {
    fn from(err: Mp4Error) -> Self {
        match err {
            Mp4Error::Malformed(msg) => Self::MalformedContainer(msg),
            Mp4Error::Unsupported(msg) => Self::UnsupportedFeature(msg),
        }
    }
}

impl From<reqwest::Error> for PlayerError {
    fn from(err: reqwest::Error) -> Self {
        Self::Transport(err.to_string())
    }
}

impl From<quick_xml::Error> for PlayerError {
    fn from(err: quick_xml::Error) -> Self {
        Self::ManifestParse(err.to_string())
    }
}

impl From<quick_xml::events::attributes::AttrError> for PlayerError {
    fn from(err: quick_xml::events::attributes::AttrError) -> Self {
        Self::ManifestParse(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, PlayerError>;
