//! # Error Types
//!
//! Only malformed input is an error. Silence and unpitched audio are normal
//! operating conditions and are reported as values by the pipeline.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("audio block is empty")]
    EmptyBlock,

    #[error("audio block has {actual} samples, expected {expected}")]
    BlockLength { expected: usize, actual: usize },

    #[error("non-finite sample at index {index}")]
    NonFiniteSample { index: usize },

    #[error("sample rate must be positive")]
    ZeroSampleRate,

    #[error("analysis window of {0} samples must be a power of two between 256 and 32768")]
    InvalidWindowSize(usize),

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("unknown note name `{0}`")]
    UnknownNote(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, Error>;
