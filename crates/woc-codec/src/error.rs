use thiserror::Error;

/// Errors from decoding or encoding shard records.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum CodecError {
    /// The payload ended before a complete field was read.
    #[error("truncated {what}: {reason}")]
    Truncated { what: &'static str, reason: String },

    /// The payload is structurally invalid for the expected layout.
    #[error("malformed {what}: {reason}")]
    Malformed { what: &'static str, reason: String },

    /// An LZF block failed to decompress.
    #[error("LZF decompression failed: {0}")]
    Lzf(String),

    /// The dtype is recognized but has no decoder.
    #[error("dtype {0} is not implemented")]
    Unsupported(String),

    /// A dtype tag outside the known table.
    #[error("unknown dtype tag: {0}")]
    UnknownDtype(String),

    /// Value shape does not match the requested kind on encode.
    #[error("value does not match dtype {expected}")]
    Mismatch { expected: &'static str },
}

/// Result alias for codec operations.
pub type CodecResult<T> = Result<T, CodecError>;
