//! Error types for openmeta-core.
//!
//! Decode entry points report outcomes through
//! [`DecodeStatus`](crate::DecodeStatus) structs; these `Result`-style
//! errors surface only from header-parsing primitives and are folded into
//! statuses at the decode boundary.

use thiserror::Error;

/// Core parsing errors.
#[derive(Debug, Error)]
#[must_use]
pub enum Error {
    #[error("unexpected end of data: need {need} bytes, have {have}")]
    UnexpectedEof { need: usize, have: usize },

    #[error("invalid byte order marker: expected 'II' or 'MM', got {0:?}")]
    InvalidByteOrder([u8; 2]),

    #[error("invalid TIFF magic: expected 0x002A or 0x002B, got 0x{0:04X}")]
    InvalidTiffMagic(u16),

    #[error("value size overflow: element size {elem_size} * count {count} overflows")]
    ValueSizeOverflow { elem_size: u64, count: u64 },

    #[error("arena exhausted: requested {requested} bytes over cap {cap}")]
    ArenaExhausted { requested: usize, cap: usize },
}

/// Result type alias for core operations.
pub type Result<T> = std::result::Result<T, Error>;
