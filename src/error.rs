//! Error types for the model plot codecs.

use thiserror::Error;

/// A record failed its construction invariants.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RecordError {
    #[error("[job_id] must not be empty")]
    EmptyJobId,
    #[error("[bucket_span] must be non-negative, got {0}")]
    NegativeBucketSpan(i64),
    #[error("timestamp {0} is outside the representable range")]
    TimestampOutOfRange(i64),
}

/// Errors raised while reading the binary wire format.
#[derive(Debug, Error)]
pub enum WireError {
    #[error("unexpected end of input: needed {needed} bytes, {remaining} remaining")]
    UnexpectedEof { needed: usize, remaining: usize },
    #[error("unexpected byte [{0:#04x}] for boolean")]
    InvalidBoolean(u8),
    #[error("invalid string encoding: {0}")]
    InvalidString(String),
    #[error("variable-length int longer than five bytes")]
    MalformedVInt,
    #[error("negative length [{0}]")]
    NegativeLength(i32),
    #[error("decoded record is invalid: {0}")]
    InvalidRecord(#[from] RecordError),
}

/// Errors raised by the structured-text (JSON) encoder and decoder.
#[derive(Debug, Error)]
pub enum XContentError {
    #[error("json: {0}")]
    Json(#[from] serde_json::Error),
    #[error("io: {0}")]
    Io(#[from] std::io::Error),
}
