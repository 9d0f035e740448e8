//! Core types and primitives for OpenMeta metadata decoding.
//!
//! This crate provides the shared substrate every decoder writes into:
//!
//! - [`ByteArena`] / [`ByteSpan`] - append-only byte arena owning all
//!   decoded payloads
//! - [`MetaStore`] - block/entry tables over one arena
//! - [`MetaKey`] / [`MetaValue`] - uniform key and value model
//! - [`ByteOrder`], [`reader`] - endian-aware bounded reads
//! - [`TiffConfig`], [`TiffType`], [`parse_tiff_header`] - TIFF stream
//!   plumbing shared by the EXIF walker and vendor MakerNote decoders
//! - [`DecodeStatus`] - shared status taxonomy with sticky severity
//!
//! # Example
//!
//! ```
//! use openmeta_core::{parse_tiff_header, ByteOrder};
//!
//! let tiff = [
//!     0x49, 0x49,             // "II" = little-endian
//!     0x2A, 0x00,             // TIFF magic (42)
//!     0x08, 0x00, 0x00, 0x00, // IFD0 offset = 8
//! ];
//!
//! let hdr = parse_tiff_header(&tiff).unwrap();
//! assert_eq!(hdr.cfg.byte_order, ByteOrder::LittleEndian);
//! assert_eq!(hdr.first_ifd, 8);
//! ```

mod arena;
mod byte_order;
mod error;
mod header;
mod key;
pub mod reader;
mod status;
mod store;
mod value;
mod wire;

pub use arena::{ByteArena, ByteSpan, DEFAULT_ARENA_CAP};
pub use byte_order::ByteOrder;
pub use error::{Error, Result};
pub use header::{parse_tiff_header, TiffHeader};
pub use key::MetaKey;
pub use reader::TiffConfig;
pub use status::DecodeStatus;
pub use store::{BlockId, BlockInfo, Entry, EntryFlags, EntryId, EntryOrigin, MetaStore};
pub use value::{ElemType, MetaValue, SRational, TextEncoding, URational, ValueData, ValueKind};
pub use wire::{tiff_type_size, TiffType, WireFamily, WireType};
