//! Error types for openmeta-formats.
//!
//! Scanners and decoders report outcomes through status structs; this
//! error type belongs to the payload-decompressor callback interface the
//! facade consumes (the library itself never decompresses).

use thiserror::Error;

/// Failure modes a payload decompressor may report.
#[derive(Debug, Error)]
#[must_use]
pub enum PayloadError {
    #[error("compression scheme not supported by this decompressor")]
    UnsupportedCompression,

    #[error("compressed stream is corrupt: {0}")]
    CorruptStream(String),

    #[error("decompressed payload exceeds the configured cap of {cap} bytes")]
    TooLarge { cap: u64 },
}
