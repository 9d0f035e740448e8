//! GIF extension scanner.
//!
//! GIF structure: "GIF87a"/"GIF89a" header, logical screen descriptor with
//! optional global colour table, then a stream of image descriptors (0x2C),
//! extensions (0x21) and the trailer (0x3B). XMP lives in an Application
//! Extension with identifier `XMP DataXMP`.

use openmeta_core::{reader, DecodeStatus};

use crate::block::{BlockChunking, BlockKind, BlockRef, BlockSink, ContainerFormat, ScanResult};

const XMP_APP_ID: &[u8] = b"XMP DataXMP";

/// Scan a GIF file for metadata extensions.
pub fn scan_gif(bytes: &[u8], out: &mut [BlockRef]) -> ScanResult {
    let mut sink = BlockSink::new(out);
    let mut status = DecodeStatus::Ok;

    if !reader::match_bytes(bytes, 0, b"GIF87a") && !reader::match_bytes(bytes, 0, b"GIF89a") {
        status.merge(DecodeStatus::Unsupported);
        return sink.finish(status);
    }

    // Logical screen descriptor: 7 bytes; bit 7 of the flags byte signals a
    // global colour table of 3 * 2^(N+1) bytes.
    let Some(flags) = reader::read_u8(bytes, 10) else {
        status.merge(DecodeStatus::Malformed);
        return sink.finish(status);
    };
    let mut pos: u64 = 13;
    if flags & 0x80 != 0 {
        pos += 3 << ((flags & 0x07) + 1);
    }

    loop {
        let Some(introducer) = reader::read_u8(bytes, pos) else {
            break;
        };
        match introducer {
            0x3B => break, // trailer
            0x21 => {
                let Some(label) = reader::read_u8(bytes, pos + 1) else {
                    status.merge(DecodeStatus::Malformed);
                    break;
                };
                let mut sub = pos + 2;
                if label == 0xFF {
                    // Application extension: fixed 11-byte identifier block.
                    let Some(id_len) = reader::read_u8(bytes, sub) else {
                        status.merge(DecodeStatus::Malformed);
                        break;
                    };
                    let is_xmp = id_len == 11 && reader::match_bytes(bytes, sub + 1, XMP_APP_ID);
                    sub += 1 + u64::from(id_len);
                    let data_start = sub;
                    let Some(end) = skip_sub_blocks(bytes, sub) else {
                        status.merge(DecodeStatus::Malformed);
                        break;
                    };
                    if is_xmp {
                        sink.push(BlockRef {
                            format: ContainerFormat::Gif,
                            kind: BlockKind::Xmp,
                            data_offset: data_start,
                            // Window covers the raw sub-block region minus
                            // its terminator.
                            data_size: (end - 1).saturating_sub(data_start),
                            chunking: BlockChunking::GifSubBlocks,
                            id: u32::from(label),
                            ..BlockRef::default()
                        });
                    }
                    pos = end;
                } else {
                    // Other extensions: skip their sub-blocks.
                    let Some(end) = skip_sub_blocks(bytes, sub) else {
                        status.merge(DecodeStatus::Malformed);
                        break;
                    };
                    pos = end;
                }
            }
            0x2C => {
                // Image descriptor: 9 bytes, optional local colour table,
                // LZW minimum code size, then image sub-blocks.
                let Some(img_flags) = reader::read_u8(bytes, pos + 9) else {
                    status.merge(DecodeStatus::Malformed);
                    break;
                };
                let mut sub = pos + 10;
                if img_flags & 0x80 != 0 {
                    sub += 3 << ((img_flags & 0x07) + 1);
                }
                sub += 1; // LZW minimum code size
                let Some(end) = skip_sub_blocks(bytes, sub) else {
                    status.merge(DecodeStatus::Malformed);
                    break;
                };
                pos = end;
            }
            _ => {
                status.merge(DecodeStatus::Malformed);
                break;
            }
        }
    }

    sink.finish(status)
}

/// Skip a chain of length-prefixed sub-blocks; returns the offset just past
/// the 0x00 terminator.
fn skip_sub_blocks(bytes: &[u8], mut pos: u64) -> Option<u64> {
    loop {
        let len = reader::read_u8(bytes, pos)?;
        pos += 1;
        if len == 0 {
            return Some(pos);
        }
        pos += u64::from(len);
        if pos > bytes.len() as u64 {
            return None;
        }
    }
}
