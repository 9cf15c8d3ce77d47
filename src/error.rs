//! Crate-wide error type.

use crate::segment::BlockStatus;

/// Errors produced by segmentation, decoding, export, the queue and playback.
#[derive(thiserror::Error, Debug)]
pub enum Error {
    #[error("credential not set: export {var} before calling the speech API")]
    MissingCredential { var: &'static str },
    #[error("speech API call failed: {0}")]
    Remote(String),
    #[error("audio decode failed: {0}")]
    Decode(String),
    #[error("document extraction failed: {0}")]
    Extraction(String),
    #[error("invalid config: {0}")]
    Config(String),
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("WAV error: {0}")]
    Wav(#[from] hound::Error),
    #[error("no block with id '{0}'")]
    UnknownBlock(String),
    #[error("block '{id}' is {status} and cannot be retried")]
    NotRetryable { id: String, status: BlockStatus },
    #[error("nothing to synthesize: text is empty")]
    EmptyText,
    #[error("audio output failed: {0}")]
    Playback(String),
}

/// Shorthand for `Result<T, textvox::Error>`.
pub type Result<T> = std::result::Result<T, Error>;
