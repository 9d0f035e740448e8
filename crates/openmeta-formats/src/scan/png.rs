//! PNG chunk scanner.
//!
//! PNG structure: 8-byte signature, then chunks of
//! `length (4 BE) + type (4) + data + CRC (4)`.
//!
//! Metadata chunks:
//! - `eXIf`: raw EXIF/TIFF data (PNG 1.5)
//! - `iCCP`: profile name, compression method, deflated ICC profile
//! - `iTXt`: international text; XMP uses keyword `XML:com.adobe.xmp`

use openmeta_core::{reader, ByteOrder, DecodeStatus};

use crate::block::{BlockCompression, BlockKind, BlockRef, BlockSink, ContainerFormat, ScanResult};

/// PNG magic signature.
pub(crate) const PNG_SIGNATURE: [u8; 8] = [0x89, b'P', b'N', b'G', 0x0D, 0x0A, 0x1A, 0x0A];

const XMP_KEYWORD: &[u8] = b"XML:com.adobe.xmp";

/// Scan a PNG file for metadata chunks.
pub fn scan_png(bytes: &[u8], out: &mut [BlockRef]) -> ScanResult {
    let mut sink = BlockSink::new(out);
    let mut status = DecodeStatus::Ok;

    if !reader::match_bytes(bytes, 0, &PNG_SIGNATURE) {
        status.merge(DecodeStatus::Unsupported);
        return sink.finish(status);
    }

    let mut pos: u64 = 8;
    loop {
        let Some(length) = reader::read_u32(bytes, pos, ByteOrder::BigEndian) else {
            break;
        };
        let data_off = pos + 8;
        let data_len = u64::from(length);
        if reader::window(bytes, data_off, data_len + 4).is_none() {
            status.merge(DecodeStatus::Malformed);
            break;
        }

        let fourcc = reader::read_u32(bytes, pos + 4, ByteOrder::BigEndian).unwrap_or(0);
        match &bytes[(pos + 4) as usize..(pos + 8) as usize] {
            b"eXIf" => {
                sink.push(BlockRef {
                    format: ContainerFormat::Png,
                    kind: BlockKind::Exif,
                    data_offset: data_off,
                    data_size: data_len,
                    id: fourcc,
                    ..BlockRef::default()
                });
            }
            b"iCCP" => {
                // name\0 method(1) deflate-stream
                if let Some(rel) = chunk_find_nul(bytes, data_off, data_len) {
                    let skip = rel + 2;
                    if skip <= data_len {
                        sink.push(BlockRef {
                            format: ContainerFormat::Png,
                            kind: BlockKind::Icc,
                            data_offset: data_off + skip,
                            data_size: data_len - skip,
                            compression: BlockCompression::Deflate,
                            id: fourcc,
                            ..BlockRef::default()
                        });
                    }
                }
            }
            b"iTXt" => {
                push_itxt(&mut sink, bytes, data_off, data_len, fourcc);
            }
            b"IEND" => break,
            _ => {}
        }

        pos = data_off + data_len + 4;
    }

    sink.finish(status)
}

/// iTXt layout: keyword\0 comp_flag(1) comp_method(1) language\0
/// translated_keyword\0 text.
fn push_itxt(sink: &mut BlockSink<'_>, bytes: &[u8], data_off: u64, data_len: u64, fourcc: u32) {
    let Some(kw_end) = chunk_find_nul(bytes, data_off, data_len) else {
        return;
    };
    if bytes[data_off as usize..(data_off + kw_end) as usize] != *XMP_KEYWORD {
        return;
    }
    let comp_flag = reader::read_u8(bytes, data_off + kw_end + 1).unwrap_or(0);
    let lang_off = kw_end + 3;
    let Some(lang_end) = chunk_find_nul(bytes, data_off + lang_off, data_len.saturating_sub(lang_off))
    else {
        return;
    };
    let trans_off = lang_off + lang_end + 1;
    let Some(trans_end) =
        chunk_find_nul(bytes, data_off + trans_off, data_len.saturating_sub(trans_off))
    else {
        return;
    };
    let text_off = trans_off + trans_end + 1;
    if text_off > data_len {
        return;
    }
    sink.push(BlockRef {
        format: ContainerFormat::Png,
        kind: BlockKind::Xmp,
        data_offset: data_off + text_off,
        data_size: data_len - text_off,
        compression: if comp_flag != 0 {
            BlockCompression::Deflate
        } else {
            BlockCompression::None
        },
        id: fourcc,
        ..BlockRef::default()
    });
}

/// Offset of the first NUL within `bytes[start .. start+len]`, relative to
/// `start`.
fn chunk_find_nul(bytes: &[u8], start: u64, len: u64) -> Option<u64> {
    let window = reader::window(bytes, start, len)?;
    window.iter().position(|&b| b == 0).map(|p| p as u64)
}
