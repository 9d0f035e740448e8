//! Preview/thumbnail candidate discovery and extraction.
//!
//! Walks the IFD graph of every EXIF block (same structural rules as the
//! main decoder, tag-filtered) looking for JPEG previews:
//! - `JPEGInterchangeFormat` (0x0201) + `JPEGInterchangeFormatLength`
//!   (0x0202) pairs in the same IFD
//! - `JpgFromRaw` (0x002E) and `JpgFromRaw2` (0x0127) byte blobs
//!
//! Candidates are file-relative windows; extraction is a bounds-checked
//! copy into a caller buffer that never follows offsets past the file.

use openmeta_core::{parse_tiff_header, reader, DecodeStatus, TiffConfig};

use crate::block::{BlockKind, BlockRef, ScanResult};
use crate::exif::classic;
use crate::scan::scan_auto;

const TAG_JPEG_INTERCHANGE: u16 = 0x0201;
const TAG_JPEG_INTERCHANGE_LEN: u16 = 0x0202;
const TAG_JPG_FROM_RAW: u16 = 0x002E;
const TAG_JPG_FROM_RAW2: u16 = 0x0127;

/// Candidate preview source kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PreviewKind {
    /// EXIF/TIFF pair `JPEGInterchangeFormat` + length.
    #[default]
    ExifJpegInterchange,
    /// EXIF/TIFF blob tag `JpgFromRaw` (0x002E).
    ExifJpgFromRaw,
    /// EXIF/TIFF blob tag `JpgFromRaw2` (0x0127).
    ExifJpgFromRaw2,
}

/// Preview candidate discovered in a container.
#[derive(Debug, Clone, Copy, Default)]
#[must_use]
pub struct PreviewCandidate {
    pub kind: PreviewKind,
    pub format: crate::block::ContainerFormat,
    pub block_index: u32,
    pub offset_tag: u16,
    pub length_tag: u16,
    /// Absolute file offset of the candidate bytes.
    pub file_offset: u64,
    pub size: u64,
    /// True when the first two bytes are the JPEG SOI marker.
    pub has_jpeg_soi_signature: bool,
}

/// Limits for preview candidate discovery.
#[derive(Debug, Clone, Copy)]
pub struct PreviewScanLimits {
    pub max_ifds: u32,
    pub max_total_entries: u32,
    pub max_preview_bytes: u64,
}

impl Default for PreviewScanLimits {
    fn default() -> Self {
        Self {
            max_ifds: 256,
            max_total_entries: 8192,
            max_preview_bytes: 512 << 20,
        }
    }
}

/// Options for preview candidate discovery.
#[derive(Debug, Clone, Copy)]
#[must_use]
pub struct PreviewScanOptions {
    pub include_exif_jpeg_interchange: bool,
    pub include_jpg_from_raw: bool,
    /// Drop candidates whose first bytes are not `FF D8`.
    pub require_jpeg_soi: bool,
    pub limits: PreviewScanLimits,
}

impl Default for PreviewScanOptions {
    fn default() -> Self {
        Self {
            include_exif_jpeg_interchange: true,
            include_jpg_from_raw: true,
            require_jpeg_soi: false,
            limits: PreviewScanLimits::default(),
        }
    }
}

/// Result for preview candidate discovery.
#[derive(Debug, Clone, Copy, Default)]
#[must_use]
pub struct PreviewScanResult {
    pub status: DecodeStatus,
    pub written: u32,
    pub needed: u32,
}

/// Options for preview extraction.
#[derive(Debug, Clone, Copy)]
#[must_use]
pub struct PreviewExtractOptions {
    pub max_output_bytes: u64,
    pub require_jpeg_soi: bool,
}

impl Default for PreviewExtractOptions {
    fn default() -> Self {
        Self { max_output_bytes: 128 << 20, require_jpeg_soi: false }
    }
}

/// Result for preview extraction.
#[derive(Debug, Clone, Copy, Default)]
#[must_use]
pub struct PreviewExtractResult {
    pub status: DecodeStatus,
    pub written: u64,
    pub needed: u64,
}

/// Run [`scan_auto`] and then [`find_preview_candidates`].
pub fn scan_preview_candidates(
    file_bytes: &[u8],
    blocks_scratch: &mut [BlockRef],
    out: &mut [PreviewCandidate],
    options: &PreviewScanOptions,
) -> PreviewScanResult {
    let scan: ScanResult = scan_auto(file_bytes, blocks_scratch);
    match scan.status {
        DecodeStatus::Unsupported => {
            return PreviewScanResult { status: DecodeStatus::Unsupported, ..Default::default() }
        }
        DecodeStatus::Malformed => {
            return PreviewScanResult { status: DecodeStatus::Malformed, ..Default::default() }
        }
        _ => {}
    }
    let written = (scan.written as usize).min(blocks_scratch.len());
    let mut result = find_preview_candidates(file_bytes, &blocks_scratch[..written], out, options);
    if scan.status == DecodeStatus::OutputTruncated && result.status == DecodeStatus::Ok {
        result.status = DecodeStatus::OutputTruncated;
    }
    result
}

/// Find candidates in already-scanned blocks.
pub fn find_preview_candidates(
    file_bytes: &[u8],
    blocks: &[BlockRef],
    out: &mut [PreviewCandidate],
    options: &PreviewScanOptions,
) -> PreviewScanResult {
    let mut result = PreviewScanResult { status: DecodeStatus::Unsupported, ..Default::default() };
    let mut saw_tiff = false;
    let mut truncated = false;

    for (i, block) in blocks.iter().enumerate() {
        if block.kind != BlockKind::Exif {
            continue;
        }
        // Multi-part EXIF blocks only contribute their first part.
        if block.part_count > 1 && block.part_index != 0 {
            continue;
        }
        saw_tiff = true;
        match collect_tiff_candidates(file_bytes, block, i as u32, out, &mut result, options) {
            DecodeStatus::OutputTruncated => truncated = true,
            DecodeStatus::LimitExceeded => {
                result.status = DecodeStatus::LimitExceeded;
                return result;
            }
            DecodeStatus::Malformed => {
                result.status = DecodeStatus::Malformed;
                return result;
            }
            _ => {}
        }
    }

    result.status = if truncated {
        DecodeStatus::OutputTruncated
    } else if !saw_tiff {
        DecodeStatus::Unsupported
    } else {
        DecodeStatus::Ok
    };
    result
}

/// Copy one candidate's bytes into `out`.
pub fn extract_preview_candidate(
    file_bytes: &[u8],
    candidate: &PreviewCandidate,
    out: &mut [u8],
    options: &PreviewExtractOptions,
) -> PreviewExtractResult {
    let mut result = PreviewExtractResult { needed: candidate.size, ..Default::default() };

    let Some(window) = reader::window(file_bytes, candidate.file_offset, candidate.size) else {
        result.status = DecodeStatus::Malformed;
        return result;
    };
    if candidate.size > options.max_output_bytes {
        result.status = DecodeStatus::LimitExceeded;
        return result;
    }
    if options.require_jpeg_soi && !window.starts_with(&[0xFF, 0xD8]) {
        result.status = DecodeStatus::Malformed;
        return result;
    }
    if (out.len() as u64) < candidate.size {
        result.status = DecodeStatus::OutputTruncated;
        return result;
    }
    out[..window.len()].copy_from_slice(window);
    result.written = candidate.size;
    result.status = DecodeStatus::Ok;
    result
}

/// Append a candidate, stamping the SOI signature and honouring the SOI
/// filter and output capacity.
fn add_candidate(
    file_bytes: &[u8],
    out: &mut [PreviewCandidate],
    result: &mut PreviewScanResult,
    options: &PreviewScanOptions,
    mut candidate: PreviewCandidate,
) -> DecodeStatus {
    candidate.has_jpeg_soi_signature = reader::window(file_bytes, candidate.file_offset, 2)
        .is_some_and(|w| w == [0xFF, 0xD8]);
    if options.require_jpeg_soi && !candidate.has_jpeg_soi_signature {
        return DecodeStatus::Ok;
    }
    result.needed += 1;
    if let Some(slot) = out.get_mut(result.written as usize) {
        *slot = candidate;
        result.written += 1;
        DecodeStatus::Ok
    } else {
        DecodeStatus::OutputTruncated
    }
}

/// Breadth-first IFD walk over one EXIF block, tag-filtered for previews.
fn collect_tiff_candidates(
    file_bytes: &[u8],
    block: &BlockRef,
    block_index: u32,
    out: &mut [PreviewCandidate],
    result: &mut PreviewScanResult,
    options: &PreviewScanOptions,
) -> DecodeStatus {
    let Some(tiff) = reader::window(file_bytes, block.data_offset, block.data_size) else {
        return DecodeStatus::Malformed;
    };
    let Ok(header) = parse_tiff_header(tiff) else {
        return DecodeStatus::Unsupported;
    };
    if header.cfg.bigtiff {
        return DecodeStatus::Unsupported;
    }
    let cfg: TiffConfig = header.cfg;
    if header.first_ifd == 0 || header.first_ifd > tiff.len() as u64 {
        return DecodeStatus::Malformed;
    }

    let limits = &options.limits;
    let mut queue: Vec<u64> = Vec::new();
    queue.push(header.first_ifd);
    let mut index = 0usize;
    let mut total_entries = 0u32;
    let mut truncated = false;

    let mut push_ifd = |queue: &mut Vec<u64>, off: u64| -> bool {
        if off == 0 || queue.contains(&off) {
            return true;
        }
        if queue.len() as u32 >= limits.max_ifds {
            return false;
        }
        queue.push(off);
        true
    };

    while index < queue.len() {
        let ifd_off = queue[index];
        index += 1;

        let Some(entry_count) = cfg.read_u16(tiff, ifd_off) else {
            return DecodeStatus::Malformed;
        };
        let ifd_bytes = 2 + u64::from(entry_count) * 12 + 4;
        if ifd_off + ifd_bytes > tiff.len() as u64 {
            return DecodeStatus::Malformed;
        }
        if total_entries + u32::from(entry_count) > limits.max_total_entries {
            return DecodeStatus::LimitExceeded;
        }
        total_entries += u32::from(entry_count);

        let mut jif_off: Option<u32> = None;
        let mut jif_len: Option<u32> = None;

        for ei in 0..u64::from(entry_count) {
            let entry_off = ifd_off + 2 + ei * 12;
            let Some(e) = classic::read_ifd_entry(cfg, tiff, entry_off) else {
                return DecodeStatus::Malformed;
            };

            match e.tag {
                TAG_JPEG_INTERCHANGE if options.include_exif_jpeg_interchange => {
                    jif_off = entry_scalar_u32(cfg, &e);
                }
                TAG_JPEG_INTERCHANGE_LEN if options.include_exif_jpeg_interchange => {
                    jif_len = entry_scalar_u32(cfg, &e);
                }
                TAG_JPG_FROM_RAW | TAG_JPG_FROM_RAW2 if options.include_jpg_from_raw => {
                    let Some(byte_count) = classic::entry_value_bytes(&e) else {
                        continue;
                    };
                    if byte_count > limits.max_preview_bytes {
                        return DecodeStatus::LimitExceeded;
                    }
                    if byte_count <= 4 {
                        continue;
                    }
                    let local_off = e.value_or_off;
                    if local_off + byte_count > tiff.len() as u64 {
                        return DecodeStatus::Malformed;
                    }
                    let candidate = PreviewCandidate {
                        kind: if e.tag == TAG_JPG_FROM_RAW {
                            PreviewKind::ExifJpgFromRaw
                        } else {
                            PreviewKind::ExifJpgFromRaw2
                        },
                        format: block.format,
                        block_index,
                        offset_tag: e.tag,
                        length_tag: 0,
                        file_offset: block.data_offset + local_off,
                        size: byte_count,
                        has_jpeg_soi_signature: false,
                    };
                    match add_candidate(file_bytes, out, result, options, candidate) {
                        DecodeStatus::OutputTruncated => truncated = true,
                        DecodeStatus::Ok => {}
                        other => return other,
                    }
                }
                _ => {}
            }

            // Recurse into the well-known sub-IFD pointers.
            if matches!(e.tag, 0x8769 | 0x8825 | 0xA005) {
                if let Some(child) = entry_scalar_u32(cfg, &e) {
                    if child != 0 && !push_ifd(&mut queue, u64::from(child)) {
                        return DecodeStatus::LimitExceeded;
                    }
                }
            } else if e.tag == 0x014A && e.wire_type == 4 && e.count != 0 {
                if e.count == 1 {
                    if !push_ifd(&mut queue, e.value_or_off) {
                        return DecodeStatus::LimitExceeded;
                    }
                } else {
                    let arr_bytes = e.count * 4;
                    if e.value_or_off + arr_bytes > tiff.len() as u64 {
                        return DecodeStatus::Malformed;
                    }
                    for ai in 0..e.count {
                        let Some(one) = cfg.read_u32(tiff, e.value_or_off + ai * 4) else {
                            return DecodeStatus::Malformed;
                        };
                        if one != 0 && !push_ifd(&mut queue, u64::from(one)) {
                            return DecodeStatus::LimitExceeded;
                        }
                    }
                }
            }
        }

        // The interchange pair must come from the same IFD.
        if let (Some(off), Some(len)) = (jif_off, jif_len) {
            if len > 0 {
                let (off, len) = (u64::from(off), u64::from(len));
                if len > limits.max_preview_bytes {
                    return DecodeStatus::LimitExceeded;
                }
                if off + len > tiff.len() as u64 {
                    return DecodeStatus::Malformed;
                }
                let candidate = PreviewCandidate {
                    kind: PreviewKind::ExifJpegInterchange,
                    format: block.format,
                    block_index,
                    offset_tag: TAG_JPEG_INTERCHANGE,
                    length_tag: TAG_JPEG_INTERCHANGE_LEN,
                    file_offset: block.data_offset + off,
                    size: len,
                    has_jpeg_soi_signature: false,
                };
                match add_candidate(file_bytes, out, result, options, candidate) {
                    DecodeStatus::OutputTruncated => truncated = true,
                    DecodeStatus::Ok => {}
                    other => return other,
                }
            }
        }

        let Some(next_ifd) = cfg.read_u32(tiff, ifd_off + 2 + u64::from(entry_count) * 12) else {
            return DecodeStatus::Malformed;
        };
        if next_ifd != 0 && !push_ifd(&mut queue, u64::from(next_ifd)) {
            return DecodeStatus::LimitExceeded;
        }
    }

    if truncated {
        DecodeStatus::OutputTruncated
    } else {
        DecodeStatus::Ok
    }
}

/// Inline SHORT/LONG scalar from an entry's value field.
fn entry_scalar_u32(cfg: TiffConfig, e: &classic::RawIfdEntry) -> Option<u32> {
    if e.count == 0 {
        return None;
    }
    match e.wire_type {
        4 => u32::try_from(e.value_or_off).ok(),
        3 => {
            // The SHORT occupies the leading half of the value field.
            let v = e.value_or_off as u32;
            Some(if cfg.byte_order == openmeta_core::ByteOrder::LittleEndian {
                v & 0xFFFF
            } else {
                (v >> 16) & 0xFFFF
            })
        }
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// TIFF with IFD1-style interchange pair pointing at `FF D8 FF D9`.
    pub(crate) fn tiff_with_preview(payload: [u8; 4]) -> Vec<u8> {
        let mut t = b"II\x2A\x00\x08\x00\x00\x00".to_vec();
        t.extend_from_slice(&2u16.to_le_bytes());
        t.extend_from_slice(&TAG_JPEG_INTERCHANGE.to_le_bytes());
        t.extend_from_slice(&4u16.to_le_bytes());
        t.extend_from_slice(&1u32.to_le_bytes());
        t.extend_from_slice(&44u32.to_le_bytes());
        t.extend_from_slice(&TAG_JPEG_INTERCHANGE_LEN.to_le_bytes());
        t.extend_from_slice(&4u16.to_le_bytes());
        t.extend_from_slice(&1u32.to_le_bytes());
        t.extend_from_slice(&4u32.to_le_bytes());
        t.extend_from_slice(&0u32.to_le_bytes()); // next IFD
        assert_eq!(t.len(), 38);
        t.resize(44, 0);
        t.extend_from_slice(&payload);
        t
    }

    #[test]
    fn interchange_pair_happy_path() {
        let file = tiff_with_preview([0xFF, 0xD8, 0xFF, 0xD9]);
        let mut blocks = [BlockRef::default(); 8];
        let mut out = [PreviewCandidate::default(); 4];
        let result =
            scan_preview_candidates(&file, &mut blocks, &mut out, &PreviewScanOptions::default());
        assert_eq!(result.status, DecodeStatus::Ok);
        assert_eq!(result.written, 1);
        let c = out[0];
        assert_eq!(c.kind, PreviewKind::ExifJpegInterchange);
        assert_eq!(c.file_offset, 44);
        assert_eq!(c.size, 4);
        assert!(c.has_jpeg_soi_signature);

        let mut buf = [0u8; 4];
        let extract =
            extract_preview_candidate(&file, &c, &mut buf, &PreviewExtractOptions::default());
        assert_eq!(extract.status, DecodeStatus::Ok);
        assert_eq!(extract.written, 4);
        assert_eq!(buf, [0xFF, 0xD8, 0xFF, 0xD9]);
    }

    #[test]
    fn extract_limit_and_truncation() {
        let file = tiff_with_preview([0xFF, 0xD8, 0xFF, 0xD9]);
        let mut blocks = [BlockRef::default(); 8];
        let mut out = [PreviewCandidate::default(); 4];
        scan_preview_candidates(&file, &mut blocks, &mut out, &PreviewScanOptions::default());

        let mut buf = [0u8; 4];
        let limited = PreviewExtractOptions { max_output_bytes: 3, ..Default::default() };
        assert_eq!(
            extract_preview_candidate(&file, &out[0], &mut buf, &limited).status,
            DecodeStatus::LimitExceeded
        );

        let mut small = [0u8; 2];
        let result = extract_preview_candidate(
            &file,
            &out[0],
            &mut small,
            &PreviewExtractOptions::default(),
        );
        assert_eq!(result.status, DecodeStatus::OutputTruncated);
        assert_eq!(result.needed, 4);
    }

    #[test]
    fn soi_filter_drops_non_jpeg() {
        let file = tiff_with_preview([0x00, 0x01, 0x02, 0x03]);
        let mut blocks = [BlockRef::default(); 8];
        let mut out = [PreviewCandidate::default(); 4];
        let options = PreviewScanOptions { require_jpeg_soi: true, ..Default::default() };
        let result = scan_preview_candidates(&file, &mut blocks, &mut out, &options);
        assert_eq!(result.status, DecodeStatus::Ok);
        assert_eq!(result.written, 0);
        assert_eq!(result.needed, 0);
    }

    #[test]
    fn cyclic_next_pointer_is_finite() {
        let mut file = tiff_with_preview([0xFF, 0xD8, 0xFF, 0xD9]);
        // Point next-IFD back at IFD0.
        file[34..38].copy_from_slice(&8u32.to_le_bytes());
        let mut blocks = [BlockRef::default(); 8];
        let mut out = [PreviewCandidate::default(); 4];
        let result =
            scan_preview_candidates(&file, &mut blocks, &mut out, &PreviewScanOptions::default());
        assert_eq!(result.written, 1);
        assert_eq!(result.status, DecodeStatus::Ok);
    }
}
