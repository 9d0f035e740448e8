//! EXIF/TIFF directory decoding.
//!
//! The walker parses classic and BigTIFF IFD chains, resolves inline vs.
//! out-of-line values, recurses into the well-known sub-IFDs, and emits
//! typed entries into a [`MetaStore`]. Vendor MakerNote decoders reuse the
//! classic-IFD machinery in [`classic`] with their own offset policies.

pub(crate) mod classic;
mod context;
mod geotiff;
mod walker;

pub use context::ExifContext;
pub use walker::decode_exif_tiff;

use openmeta_core::{DecodeStatus, MetaStore};

/// Configurable decode caps. Exceeding one degrades gracefully: emission
/// stops and the result records [`DecodeStatus::LimitExceeded`].
#[derive(Debug, Clone, Copy)]
#[must_use]
pub struct ExifDecodeLimits {
    /// Cap on entries in a single IFD.
    pub max_entries_per_ifd: u32,
    /// Cap on entries across one decode call, vendor sub-blocks included.
    pub max_total_entries: u32,
    /// Cap on one value's payload bytes; larger values keep their entry but
    /// get an empty payload and the `TRUNCATED` flag.
    pub max_value_bytes: u32,
    /// Cap on directories walked in one decode call.
    pub max_ifds: u32,
}

impl Default for ExifDecodeLimits {
    fn default() -> Self {
        Self {
            max_entries_per_ifd: 512,
            max_total_entries: 4096,
            max_value_bytes: 1 << 20,
            max_ifds: 64,
        }
    }
}

/// Options for one decode call.
#[derive(Debug, Clone)]
#[must_use]
pub struct ExifDecodeOptions {
    pub limits: ExifDecodeLimits,
    /// Prefix prepended to every IFD token this call emits (`ifd0`, `exif`,
    /// `gps`, ...). Empty for the first EXIF block; the facade namespaces
    /// further blocks (`b1_`, `cmt2_`, ...) so tokens stay unique per store.
    pub token_namespace: String,
    /// Decode vendor MakerNote subdirectories (tag 0x927C).
    pub decode_makernote: bool,
    /// Derive GeoTIFF keys when tag 0x87AF is present.
    pub decode_geotiff: bool,
}

impl Default for ExifDecodeOptions {
    fn default() -> Self {
        Self {
            limits: ExifDecodeLimits::default(),
            token_namespace: String::new(),
            decode_makernote: true,
            decode_geotiff: true,
        }
    }
}

impl ExifDecodeOptions {
    /// Namespaced IFD token.
    pub(crate) fn token(&self, base: &str) -> String {
        format!("{}{}", self.token_namespace, base)
    }
}

/// Accumulated outcome of a decode call.
#[derive(Debug, Clone, Copy, Default)]
#[must_use]
pub struct ExifDecodeResult {
    pub status: DecodeStatus,
    /// Entries emitted into the store, vendor sub-blocks included.
    pub entries_emitted: u32,
    /// Directories walked, vendor sub-directories included.
    pub ifds_walked: u32,
}

impl ExifDecodeResult {
    /// Sticky status update; never lowers severity.
    pub fn update(&mut self, status: DecodeStatus) {
        self.status.merge(status);
    }

    /// True while another entry may be emitted under `limits`.
    pub(crate) fn entry_budget_left(&self, limits: &ExifDecodeLimits) -> bool {
        self.entries_emitted < limits.max_total_entries
    }

    /// True while another directory may be opened under `limits`.
    pub(crate) fn ifd_budget_left(&self, limits: &ExifDecodeLimits) -> bool {
        self.ifds_walked < limits.max_ifds
    }
}

/// Convenience wrapper: parse the TIFF header at the start of `bytes` and
/// decode from its first IFD.
pub fn decode_tiff_stream(
    bytes: &[u8],
    store: &mut MetaStore,
    options: &ExifDecodeOptions,
) -> ExifDecodeResult {
    match openmeta_core::parse_tiff_header(bytes) {
        Ok(header) => decode_exif_tiff(bytes, header.cfg, header.first_ifd, store, options),
        Err(_) => {
            let mut result = ExifDecodeResult::default();
            result.update(DecodeStatus::Unsupported);
            result
        }
    }
}
