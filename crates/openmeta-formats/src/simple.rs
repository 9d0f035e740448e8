//! One-call metadata read facade.
//!
//! [`simple_meta_read`] composes the pipeline: scan the container, decode
//! every EXIF block into the store, and collect the remaining metadata
//! payloads (XMP, ICC, Photoshop IRB) into a caller buffer with one part
//! record per block. XMP is exposed, never parsed; compressed payloads go
//! through the optional decompressor callback or are passed through
//! compressed.

use openmeta_core::{parse_tiff_header, reader, DecodeStatus, MetaStore};
use tracing::debug;

use crate::block::{BlockCompression, BlockKind, BlockRef, ContainerFormat};
use crate::error::PayloadError;
use crate::exif::{decode_exif_tiff, ExifDecodeOptions, ExifDecodeResult};
use crate::scan::scan_auto;

/// Decompressor callback: given the compression scheme and the compressed
/// bytes, produce the plain payload.
pub type PayloadDecompressFn<'a> =
    &'a dyn Fn(BlockCompression, &[u8]) -> Result<Vec<u8>, PayloadError>;

/// Payload collection options.
#[derive(Default)]
#[must_use]
pub struct PayloadOptions<'a> {
    /// Optional decompressor for Deflate/Brotli payloads. Without one,
    /// compressed payloads are copied through verbatim and their part
    /// records keep the compression marker.
    pub decompress: Option<PayloadDecompressFn<'a>>,
    /// Kinds to collect; empty means XMP + ICC + Photoshop IRB.
    pub kinds: Vec<BlockKind>,
}

/// One decoded EXIF block.
#[derive(Debug, Clone, Copy, Default)]
#[must_use]
pub struct IfdRef {
    /// Index into the caller's block table.
    pub block_index: u32,
    /// Outcome of decoding this block.
    pub result: ExifDecodeResult,
}

/// One collected payload slice.
#[derive(Debug, Clone, Copy, Default)]
#[must_use]
pub struct PayloadPart {
    pub block_index: u32,
    pub kind: BlockKind,
    /// Offset of this part's bytes within the caller's payload buffer.
    pub payload_offset: u64,
    pub size: u64,
    /// Compression still applied to the copied bytes (None when the
    /// decompressor ran).
    pub compression: BlockCompression,
}

/// Result of [`simple_meta_read`]; every `(written, needed)` pair follows
/// the grow-and-retry contract.
#[derive(Debug, Clone, Copy, Default)]
#[must_use]
pub struct SimpleMetaResult {
    pub status: DecodeStatus,
    pub blocks_written: u32,
    pub blocks_needed: u32,
    pub ifd_refs_written: u32,
    pub ifd_refs_needed: u32,
    pub payload_written: u64,
    pub payload_needed: u64,
    pub parts_written: u32,
    pub parts_needed: u32,
}

/// Scan, decode and collect in one pass. The store is finalized before
/// returning.
#[allow(clippy::too_many_arguments)]
pub fn simple_meta_read(
    bytes: &[u8],
    store: &mut MetaStore,
    blocks: &mut [BlockRef],
    ifd_refs: &mut [IfdRef],
    payload: &mut [u8],
    parts: &mut [PayloadPart],
    exif_options: &ExifDecodeOptions,
    payload_options: &PayloadOptions<'_>,
) -> SimpleMetaResult {
    let mut result = SimpleMetaResult::default();

    let scan = scan_auto(bytes, blocks);
    result.status.merge(scan.status);
    result.blocks_written = scan.written;
    result.blocks_needed = scan.needed;
    if scan.status == DecodeStatus::Unsupported {
        return result;
    }

    let visible = &blocks[..scan.written as usize];
    let mut exif_ordinal = 0u32;
    for (i, block) in visible.iter().enumerate() {
        match block.kind {
            BlockKind::Exif => {
                // Multi-part EXIF carriers contribute their first part only.
                if block.part_count > 1 && block.part_index != 0 {
                    continue;
                }
                let decode =
                    decode_exif_block(bytes, block, exif_ordinal, store, exif_options);
                if let Some(decode) = decode {
                    result.status.merge(decode.status);
                    result.ifd_refs_needed += 1;
                    if let Some(slot) = ifd_refs.get_mut(result.ifd_refs_written as usize) {
                        *slot = IfdRef { block_index: i as u32, result: decode };
                        result.ifd_refs_written += 1;
                    } else {
                        result.status.merge(DecodeStatus::OutputTruncated);
                    }
                }
                exif_ordinal += 1;
            }
            kind if payload_kind_wanted(kind, payload_options) => {
                collect_payload(bytes, block, i as u32, payload, parts, payload_options, &mut result);
            }
            _ => {}
        }
    }

    store.finalize();
    result
}

fn payload_kind_wanted(kind: BlockKind, options: &PayloadOptions<'_>) -> bool {
    if options.kinds.is_empty() {
        matches!(
            kind,
            BlockKind::Xmp | BlockKind::Icc | BlockKind::PhotoshopIrb | BlockKind::CompressedMetadata
        )
    } else {
        options.kinds.contains(&kind)
    }
}

/// Decode one EXIF block, namespacing tokens so multiple blocks in one
/// store never collide (`ifd0`, `b1_ifd0`, `cmt1_ifd0`, ...).
fn decode_exif_block(
    bytes: &[u8],
    block: &BlockRef,
    ordinal: u32,
    store: &mut MetaStore,
    exif_options: &ExifDecodeOptions,
) -> Option<ExifDecodeResult> {
    let tiff = reader::window(bytes, block.data_offset, block.data_size)?;
    let header = match parse_tiff_header(tiff) {
        Ok(h) => h,
        Err(_) => {
            debug!(offset = block.data_offset, "exif block without TIFF header");
            let mut r = ExifDecodeResult::default();
            r.update(DecodeStatus::Malformed);
            return Some(r);
        }
    };

    let namespace = block_namespace(block, ordinal, &exif_options.token_namespace);
    let options = ExifDecodeOptions { token_namespace: namespace, ..exif_options.clone() };
    Some(decode_exif_tiff(tiff, header.cfg, header.first_ifd, store, &options))
}

/// CR3 CMT blocks keep their box name as namespace; further EXIF blocks
/// get an ordinal prefix.
fn block_namespace(block: &BlockRef, ordinal: u32, base: &str) -> String {
    if block.format == ContainerFormat::Cr3 {
        let fourcc = block.id.to_be_bytes();
        if let Ok(name) = std::str::from_utf8(&fourcc) {
            if name.starts_with("CMT") {
                return format!("{base}{}_", name.to_ascii_lowercase());
            }
        }
    }
    if ordinal == 0 {
        base.to_string()
    } else {
        format!("{base}b{ordinal}_")
    }
}

/// Copy (or decompress) one payload block into the caller buffer.
fn collect_payload(
    bytes: &[u8],
    block: &BlockRef,
    block_index: u32,
    payload: &mut [u8],
    parts: &mut [PayloadPart],
    options: &PayloadOptions<'_>,
    result: &mut SimpleMetaResult,
) {
    let Some(src) = reader::window(bytes, block.data_offset, block.data_size) else {
        result.status.merge(DecodeStatus::Malformed);
        return;
    };

    let (data, compression): (std::borrow::Cow<'_, [u8]>, BlockCompression) =
        match (block.compression, options.decompress) {
            (BlockCompression::None, _) => (src.into(), BlockCompression::None),
            (compression, Some(decompress)) => match decompress(compression, src) {
                Ok(plain) => (plain.into(), BlockCompression::None),
                Err(PayloadError::UnsupportedCompression) => {
                    result.status.merge(DecodeStatus::Unsupported);
                    (src.into(), compression)
                }
                Err(_) => {
                    result.status.merge(DecodeStatus::Malformed);
                    return;
                }
            },
            (compression, None) => (src.into(), compression),
        };

    let part = PayloadPart {
        block_index,
        kind: block.kind,
        payload_offset: result.payload_needed,
        size: data.len() as u64,
        compression,
    };
    result.parts_needed += 1;
    let fits = result.payload_needed + data.len() as u64 <= payload.len() as u64;
    if fits {
        if let Some(slot) = parts.get_mut(result.parts_written as usize) {
            let start = result.payload_needed as usize;
            payload[start..start + data.len()].copy_from_slice(&data);
            *slot = part;
            result.parts_written += 1;
            result.payload_written += data.len() as u64;
        } else {
            result.status.merge(DecodeStatus::OutputTruncated);
        }
    } else {
        result.status.merge(DecodeStatus::OutputTruncated);
    }
    result.payload_needed += data.len() as u64;
}

#[cfg(test)]
mod tests {
    use super::*;
    use openmeta_core::MetaKey;

    /// JPEG with an EXIF APP1 (one Make entry) and an XMP APP1.
    fn jpeg_with_exif_and_xmp() -> Vec<u8> {
        let mut tiff = b"II\x2A\x00\x08\x00\x00\x00".to_vec();
        tiff.extend_from_slice(&1u16.to_le_bytes());
        tiff.extend_from_slice(&0x010Fu16.to_le_bytes());
        tiff.extend_from_slice(&2u16.to_le_bytes());
        tiff.extend_from_slice(&4u32.to_le_bytes());
        tiff.extend_from_slice(b"Fuji");
        tiff.extend_from_slice(&0u32.to_le_bytes());

        let mut exif_payload = b"Exif\x00\x00".to_vec();
        exif_payload.extend_from_slice(&tiff);
        let xmp_payload = {
            let mut p = b"http://ns.adobe.com/xap/1.0/\x00".to_vec();
            p.extend_from_slice(b"<x:xmpmeta/>");
            p
        };

        let mut file = vec![0xFF, 0xD8];
        for payload in [&exif_payload, &xmp_payload] {
            file.extend_from_slice(&[0xFF, 0xE1]);
            file.extend_from_slice(&((payload.len() + 2) as u16).to_be_bytes());
            file.extend_from_slice(payload);
        }
        file.extend_from_slice(&[0xFF, 0xD9]);
        file
    }

    #[test]
    fn end_to_end_jpeg() {
        let file = jpeg_with_exif_and_xmp();
        let mut store = MetaStore::new();
        let mut blocks = [BlockRef::default(); 8];
        let mut ifd_refs = [IfdRef::default(); 4];
        let mut payload = vec![0u8; 256];
        let mut parts = [PayloadPart::default(); 4];

        let result = simple_meta_read(
            &file,
            &mut store,
            &mut blocks,
            &mut ifd_refs,
            &mut payload,
            &mut parts,
            &ExifDecodeOptions::default(),
            &PayloadOptions::default(),
        );

        assert_eq!(result.status, DecodeStatus::Ok);
        assert_eq!(result.blocks_written, 2);
        assert_eq!(result.ifd_refs_written, 1);
        assert_eq!(result.parts_written, 1);

        // The Make entry decoded into ifd0.
        let make = store
            .iter()
            .find(|(_, e)| matches!(e.key, MetaKey::ExifTag { tag: 0x010F, .. }))
            .map(|(_, e)| *e)
            .unwrap();
        assert_eq!(store.arena().span(make.value.span().unwrap()), b"Fuji");

        // The XMP payload was copied out verbatim.
        let part = parts[0];
        assert_eq!(part.kind, BlockKind::Xmp);
        let xmp = &payload[part.payload_offset as usize..][..part.size as usize];
        assert_eq!(xmp, b"<x:xmpmeta/>");
    }

    #[test]
    fn truncated_payload_reports_needed() {
        let file = jpeg_with_exif_and_xmp();
        let mut store = MetaStore::new();
        let mut blocks = [BlockRef::default(); 8];
        let mut ifd_refs = [IfdRef::default(); 4];
        let mut payload = vec![0u8; 2]; // too small for the XMP packet
        let mut parts = [PayloadPart::default(); 4];

        let result = simple_meta_read(
            &file,
            &mut store,
            &mut blocks,
            &mut ifd_refs,
            &mut payload,
            &mut parts,
            &ExifDecodeOptions::default(),
            &PayloadOptions::default(),
        );
        assert_eq!(result.status, DecodeStatus::OutputTruncated);
        assert_eq!(result.parts_written, 0);
        assert_eq!(result.payload_needed, 12);
    }

    #[test]
    fn decompress_callback_errors_fold_to_status() {
        // PNG with a deflate-compressed iCCP chunk and a failing callback.
        let mut file = vec![0x89, b'P', b'N', b'G', 0x0D, 0x0A, 0x1A, 0x0A];
        let chunk_data = b"icc\x00\x00ZZZZ";
        file.extend_from_slice(&(chunk_data.len() as u32).to_be_bytes());
        file.extend_from_slice(b"iCCP");
        file.extend_from_slice(chunk_data);
        file.extend_from_slice(&[0, 0, 0, 0]);
        file.extend_from_slice(&0u32.to_be_bytes());
        file.extend_from_slice(b"IEND");
        file.extend_from_slice(&[0, 0, 0, 0]);

        let fail: PayloadDecompressFn<'_> =
            &|_, _| Err(PayloadError::CorruptStream("bad stream".to_string()));
        let mut store = MetaStore::new();
        let mut blocks = [BlockRef::default(); 4];
        let mut ifd_refs = [IfdRef::default(); 2];
        let mut payload = vec![0u8; 64];
        let mut parts = [PayloadPart::default(); 2];

        let result = simple_meta_read(
            &file,
            &mut store,
            &mut blocks,
            &mut ifd_refs,
            &mut payload,
            &mut parts,
            &ExifDecodeOptions::default(),
            &PayloadOptions { decompress: Some(fail), kinds: Vec::new() },
        );
        assert_eq!(result.status, DecodeStatus::Malformed);
        assert_eq!(result.parts_written, 0);
    }
}
