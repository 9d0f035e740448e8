//! Container scanning.
//!
//! [`scan_auto`] detects the file format by magic and delegates to the
//! per-format scanner. Scanners are read-only and position-bounded: they
//! emit [`BlockRef`] windows into the caller's byte span and never copy
//! payload bytes.

mod bmff;
mod gif;
mod jpeg;
mod png;
mod tiff;
mod webp;

pub use bmff::scan_bmff;
pub use gif::scan_gif;
pub use jpeg::scan_jpeg;
pub use png::scan_png;
pub use tiff::scan_tiff;
pub use webp::scan_webp;

use openmeta_core::{reader, DecodeStatus};
use tracing::trace;

use crate::block::{BlockRef, ContainerFormat, ScanResult};

/// Detect the container format of `bytes` by magic.
///
/// Detection order: JPEG SOI, PNG signature, RIFF/WebP, GIF, BMFF (`ftyp`
/// at offset 4 or JP2/JXL signature box), TIFF.
pub fn detect_format(bytes: &[u8]) -> ContainerFormat {
    if reader::match_bytes(bytes, 0, &[0xFF, 0xD8]) {
        return ContainerFormat::Jpeg;
    }
    if reader::match_bytes(bytes, 0, &png::PNG_SIGNATURE) {
        return ContainerFormat::Png;
    }
    if reader::match_bytes(bytes, 0, b"RIFF") && reader::match_bytes(bytes, 8, b"WEBP") {
        return ContainerFormat::Webp;
    }
    if reader::match_bytes(bytes, 0, b"GIF87a") || reader::match_bytes(bytes, 0, b"GIF89a") {
        return ContainerFormat::Gif;
    }
    let bmff = bmff::detect_bmff_format(bytes);
    if bmff != ContainerFormat::Unknown {
        return bmff;
    }
    if reader::match_bytes(bytes, 0, b"II\x2A\x00")
        || reader::match_bytes(bytes, 0, b"MM\x00\x2A")
        || reader::match_bytes(bytes, 0, b"II\x2B\x00")
        || reader::match_bytes(bytes, 0, b"MM\x00\x2B")
    {
        return ContainerFormat::Tiff;
    }
    ContainerFormat::Unknown
}

/// Detect the format and scan for metadata blocks.
pub fn scan_auto(bytes: &[u8], out: &mut [BlockRef]) -> ScanResult {
    let format = detect_format(bytes);
    trace!(format = format.name(), len = bytes.len(), "scan_auto");
    match format {
        ContainerFormat::Jpeg => scan_jpeg(bytes, out),
        ContainerFormat::Png => scan_png(bytes, out),
        ContainerFormat::Webp => scan_webp(bytes, out),
        ContainerFormat::Gif => scan_gif(bytes, out),
        ContainerFormat::Heif
        | ContainerFormat::Avif
        | ContainerFormat::Cr3
        | ContainerFormat::Jp2
        | ContainerFormat::Jxl => scan_bmff(bytes, out),
        ContainerFormat::Tiff => scan_tiff(bytes, out),
        ContainerFormat::Unknown => ScanResult {
            status: DecodeStatus::Unsupported,
            written: 0,
            needed: 0,
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn magic_detection() {
        assert_eq!(detect_format(&[0xFF, 0xD8, 0xFF]), ContainerFormat::Jpeg);
        assert_eq!(
            detect_format(&[0x89, b'P', b'N', b'G', 0x0D, 0x0A, 0x1A, 0x0A]),
            ContainerFormat::Png
        );
        assert_eq!(detect_format(b"RIFF\x00\x00\x00\x00WEBP"), ContainerFormat::Webp);
        assert_eq!(detect_format(b"GIF89a"), ContainerFormat::Gif);
        assert_eq!(detect_format(b"II\x2A\x00"), ContainerFormat::Tiff);
        assert_eq!(detect_format(b"MM\x00\x2A"), ContainerFormat::Tiff);
        assert_eq!(detect_format(b"not an image"), ContainerFormat::Unknown);
    }

    #[test]
    fn unknown_input_is_unsupported() {
        let mut out = [BlockRef::default(); 1];
        let result = scan_auto(b"plain text", &mut out);
        assert_eq!(result.status, DecodeStatus::Unsupported);
        assert_eq!(result.needed, 0);
    }
}
