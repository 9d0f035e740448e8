//! Container scanners, EXIF/TIFF decoding and MakerNote handling.
//!
//! This crate is the read pipeline of OpenMeta:
//!
//! 1. [`scan_auto`] locates metadata blocks ([`BlockRef`]) in a file byte
//!    span - JPEG segments, PNG/WebP/GIF chunks, BMFF boxes (HEIF, AVIF,
//!    CR3, JP2, JXL), or a plain TIFF. No payload bytes are copied.
//! 2. [`decode_exif_tiff`] walks the IFD chain of an EXIF block into a
//!    [`MetaStore`](openmeta_core::MetaStore), recursing into sub-IFDs,
//!    deriving GeoTIFF keys, and dispatching vendor MakerNotes (Canon,
//!    Sony, Nikon, Olympus, Pentax, Kodak, Ricoh, Panasonic, Minolta,
//!    Casio, FLIR, HP, Nintendo, Reconyx, Samsung).
//! 3. [`scan_preview_candidates`] / [`extract_preview_candidate`] discover
//!    and copy JPEG thumbnails out of the same IFD graph.
//! 4. [`simple_meta_read`] composes the whole pipeline in one call.
//!
//! Every entry point is a pure read over `&[u8]`: no I/O, no panics on
//! untrusted input, and `(status, written, needed)` results with a
//! grow-and-retry contract for caller buffers.
//!
//! # Quick start
//!
//! ```no_run
//! use openmeta_core::MetaStore;
//! use openmeta_formats::{scan_auto, BlockRef};
//!
//! let data = std::fs::read("photo.jpg").unwrap();
//! let mut blocks = vec![BlockRef::default(); 16];
//! let result = openmeta_formats::scan_auto(&data, &mut blocks);
//! for block in &blocks[..result.written as usize] {
//!     println!("{} {} @{}+{}", block.format.name(), block.kind.name(),
//!              block.data_offset, block.data_size);
//! }
//! # let _ = MetaStore::new();
//! ```

mod block;
mod error;
pub mod exif;
mod makernotes;
mod preview;
mod scan;
mod simple;

pub use block::{
    BlockChunking, BlockCompression, BlockKind, BlockRef, ContainerFormat, ScanResult,
};
pub use error::PayloadError;
pub use exif::{
    decode_exif_tiff, decode_tiff_stream, ExifContext, ExifDecodeLimits, ExifDecodeOptions,
    ExifDecodeResult,
};
pub use preview::{
    extract_preview_candidate, find_preview_candidates, scan_preview_candidates, PreviewCandidate,
    PreviewExtractOptions, PreviewExtractResult, PreviewKind, PreviewScanLimits,
    PreviewScanOptions, PreviewScanResult,
};
pub use scan::{detect_format, scan_auto, scan_bmff, scan_gif, scan_jpeg, scan_png, scan_tiff, scan_webp};
pub use simple::{
    simple_meta_read, IfdRef, PayloadDecompressFn, PayloadOptions, PayloadPart, SimpleMetaResult,
};
