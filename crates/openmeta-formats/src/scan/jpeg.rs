//! JPEG segment scanner.
//!
//! JPEG files consist of segments, each starting with an 0xFF marker:
//! - SOI (0xFFD8) - Start of Image
//! - APP1 (0xFFE1) - EXIF or XMP
//! - APP2 (0xFFE2) - ICC profile, split across segments with (seq, total)
//! - APP13 (0xFFED) - Photoshop IRB
//! - SOS (0xFFDA) / EOI (0xFFD9) - scan data / end, metadata stops here
//!
//! Only metadata-bearing segments are emitted; everything else is skipped
//! by declared length.

use openmeta_core::{reader, DecodeStatus};

use crate::block::{
    BlockChunking, BlockKind, BlockRef, BlockSink, ContainerFormat, ScanResult,
};

const EXIF_PREFIX: &[u8] = b"Exif\x00\x00";
const XMP_PREFIX: &[u8] = b"http://ns.adobe.com/xap/1.0/\x00";
const ICC_PREFIX: &[u8] = b"ICC_PROFILE\x00";
const PSIRB_PREFIX: &[u8] = b"Photoshop 3.0\x00";

/// Scan a JPEG file for metadata segments.
pub fn scan_jpeg(bytes: &[u8], out: &mut [BlockRef]) -> ScanResult {
    let mut sink = BlockSink::new(out);
    let mut status = DecodeStatus::Ok;

    if !reader::match_bytes(bytes, 0, &[0xFF, 0xD8]) {
        status.merge(DecodeStatus::Unsupported);
        return sink.finish(status);
    }

    let mut pos: u64 = 2;
    loop {
        let Some(first) = reader::read_u8(bytes, pos) else {
            break;
        };
        if first != 0xFF {
            status.merge(DecodeStatus::Malformed);
            break;
        }

        // Skip fill bytes.
        let mut marker = first;
        let mut marker_pos = pos + 1;
        loop {
            match reader::read_u8(bytes, marker_pos) {
                Some(0xFF) => marker_pos += 1,
                Some(m) => {
                    marker = m;
                    break;
                }
                None => return sink.finish(status),
            }
        }

        // EOI or SOS: no metadata past this point.
        if marker == 0xD9 || marker == 0xDA {
            break;
        }
        // Standalone markers carry no length word.
        if (0xD0..=0xD7).contains(&marker) || marker == 0x01 {
            pos = marker_pos + 1;
            continue;
        }

        let Some(seg_len) = reader::read_u16(bytes, marker_pos + 1, openmeta_core::ByteOrder::BigEndian)
        else {
            status.merge(DecodeStatus::Malformed);
            break;
        };
        if seg_len < 2 {
            status.merge(DecodeStatus::Malformed);
            break;
        }
        let data_off = marker_pos + 3;
        let data_len = u64::from(seg_len) - 2;
        if reader::window(bytes, data_off, data_len).is_none() {
            // Declared size exceeds the file: malformed, not truncated.
            status.merge(DecodeStatus::Malformed);
            break;
        }

        let id = 0xFF00u32 | u32::from(marker);
        match marker {
            0xE1 if reader::match_bytes(bytes, data_off, EXIF_PREFIX) => {
                let skip = EXIF_PREFIX.len() as u64;
                sink.push(BlockRef {
                    format: ContainerFormat::Jpeg,
                    kind: BlockKind::Exif,
                    data_offset: data_off + skip,
                    data_size: data_len.saturating_sub(skip),
                    id,
                    ..BlockRef::default()
                });
            }
            0xE1 if reader::match_bytes(bytes, data_off, XMP_PREFIX) => {
                let skip = XMP_PREFIX.len() as u64;
                sink.push(BlockRef {
                    format: ContainerFormat::Jpeg,
                    kind: BlockKind::Xmp,
                    data_offset: data_off + skip,
                    data_size: data_len.saturating_sub(skip),
                    id,
                    ..BlockRef::default()
                });
            }
            0xE2 if reader::match_bytes(bytes, data_off, ICC_PREFIX) => {
                let prefix = ICC_PREFIX.len() as u64;
                let seq = reader::read_u8(bytes, data_off + prefix).unwrap_or(0);
                let total = reader::read_u8(bytes, data_off + prefix + 1).unwrap_or(0);
                let skip = prefix + 2;
                sink.push(BlockRef {
                    format: ContainerFormat::Jpeg,
                    kind: BlockKind::Icc,
                    data_offset: data_off + skip,
                    data_size: data_len.saturating_sub(skip),
                    chunking: BlockChunking::JpegApp2SeqTotal,
                    id,
                    aux_u32: (u32::from(seq) << 8) | u32::from(total),
                    part_index: u32::from(seq.saturating_sub(1)),
                    part_count: u32::from(total),
                    ..BlockRef::default()
                });
            }
            0xED if reader::match_bytes(bytes, data_off, PSIRB_PREFIX) => {
                let skip = PSIRB_PREFIX.len() as u64;
                sink.push(BlockRef {
                    format: ContainerFormat::Jpeg,
                    kind: BlockKind::PhotoshopIrb,
                    data_offset: data_off + skip,
                    data_size: data_len.saturating_sub(skip),
                    chunking: BlockChunking::PsIrb8Bim,
                    id,
                    ..BlockRef::default()
                });
            }
            _ => {}
        }

        pos = data_off + data_len;
    }

    sink.finish(status)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn app_segment(marker: u8, payload: &[u8]) -> Vec<u8> {
        let mut seg = vec![0xFF, marker];
        seg.extend_from_slice(&((payload.len() as u16 + 2).to_be_bytes()));
        seg.extend_from_slice(payload);
        seg
    }

    #[test]
    fn exif_prefix_is_stripped() {
        let mut file = vec![0xFF, 0xD8];
        let mut payload = EXIF_PREFIX.to_vec();
        payload.extend_from_slice(b"II\x2A\x00\x08\x00\x00\x00");
        file.extend_from_slice(&app_segment(0xE1, &payload));
        file.extend_from_slice(&[0xFF, 0xD9]);

        let mut out = [BlockRef::default(); 4];
        let result = scan_jpeg(&file, &mut out);
        assert_eq!(result.status, DecodeStatus::Ok);
        assert_eq!(result.written, 1);
        assert_eq!(out[0].kind, BlockKind::Exif);
        assert_eq!(out[0].data_offset, 2 + 4 + 6);
        assert_eq!(out[0].data_size, 8);
    }

    #[test]
    fn icc_parts_share_id() {
        let mut file = vec![0xFF, 0xD8];
        for seq in 1..=2u8 {
            let mut payload = ICC_PREFIX.to_vec();
            payload.push(seq);
            payload.push(2);
            payload.extend_from_slice(b"ICC!");
            file.extend_from_slice(&app_segment(0xE2, &payload));
        }
        file.extend_from_slice(&[0xFF, 0xD9]);

        let mut out = [BlockRef::default(); 4];
        let result = scan_jpeg(&file, &mut out);
        assert_eq!(result.written, 2);
        assert_eq!(out[0].id, out[1].id);
        assert_eq!(out[0].part_index, 0);
        assert_eq!(out[1].part_index, 1);
        assert_eq!(out[0].part_count, 2);
        assert_eq!(out[0].chunking, BlockChunking::JpegApp2SeqTotal);
    }

    #[test]
    fn oversized_segment_is_malformed() {
        let mut file = vec![0xFF, 0xD8, 0xFF, 0xE1];
        file.extend_from_slice(&1000u16.to_be_bytes());
        file.extend_from_slice(b"short");
        let mut out = [BlockRef::default(); 4];
        let result = scan_jpeg(&file, &mut out);
        assert_eq!(result.status, DecodeStatus::Malformed);
        assert_eq!(result.written, 0);
    }

    #[test]
    fn not_a_jpeg() {
        let mut out = [BlockRef::default(); 1];
        let result = scan_jpeg(b"GIF89a", &mut out);
        assert_eq!(result.status, DecodeStatus::Unsupported);
    }
}
