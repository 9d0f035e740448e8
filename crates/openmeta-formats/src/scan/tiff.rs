//! Plain TIFF scanner.
//!
//! A TIFF file is its own metadata block: the whole file is emitted as one
//! Exif block, and the top-level IFD chain is walked shallowly for embedded
//! XMP (tag 0x02BC) and ICC profile (tag 0x8773) values, which get their
//! own blocks pointing into the same file.

use openmeta_core::{parse_tiff_header, reader, tiff_type_size, DecodeStatus, TiffConfig};

use crate::block::{BlockKind, BlockRef, BlockSink, ContainerFormat, ScanResult};

const TAG_XMP: u16 = 0x02BC;
const TAG_ICC: u16 = 0x8773;

/// Shallow walk cap; the full decoder applies configurable limits instead.
const MAX_SCAN_IFDS: usize = 64;

/// Scan a plain TIFF file for metadata blocks.
pub fn scan_tiff(bytes: &[u8], out: &mut [BlockRef]) -> ScanResult {
    let mut sink = BlockSink::new(out);
    let mut status = DecodeStatus::Ok;

    let header = match parse_tiff_header(bytes) {
        Ok(h) => h,
        Err(_) => {
            status.merge(DecodeStatus::Unsupported);
            return sink.finish(status);
        }
    };

    sink.push(BlockRef {
        format: ContainerFormat::Tiff,
        kind: BlockKind::Exif,
        data_offset: 0,
        data_size: bytes.len() as u64,
        ..BlockRef::default()
    });

    let mut visited: Vec<u64> = Vec::new();
    let mut ifd_off = header.first_ifd;
    while ifd_off != 0 && visited.len() < MAX_SCAN_IFDS {
        if visited.contains(&ifd_off) {
            break;
        }
        visited.push(ifd_off);
        match scan_ifd(bytes, header.cfg, ifd_off, &mut sink) {
            Some(next) => ifd_off = next,
            None => {
                status.merge(DecodeStatus::Malformed);
                break;
            }
        }
    }

    sink.finish(status)
}

/// Walk one IFD for XMP/ICC value windows; returns the next-IFD offset.
fn scan_ifd(bytes: &[u8], cfg: TiffConfig, ifd_off: u64, sink: &mut BlockSink<'_>) -> Option<u64> {
    let (entry_count, entries_off, entry_size) = if cfg.bigtiff {
        (cfg.read_u64(bytes, ifd_off)?, ifd_off + 8, 20u64)
    } else {
        (u64::from(cfg.read_u16(bytes, ifd_off)?), ifd_off + 2, 12u64)
    };
    let inline_max = if cfg.bigtiff { 8 } else { 4 };

    for i in 0..entry_count {
        let entry_off = entries_off + i * entry_size;
        let tag = cfg.read_u16(bytes, entry_off)?;
        if tag != TAG_XMP && tag != TAG_ICC {
            continue;
        }
        let wire_type = cfg.read_u16(bytes, entry_off + 2)?;
        let count = if cfg.bigtiff {
            cfg.read_u64(bytes, entry_off + 4)?
        } else {
            u64::from(cfg.read_u32(bytes, entry_off + 4)?)
        };
        let value_field_off = entry_off + if cfg.bigtiff { 12 } else { 8 };

        let elem = tiff_type_size(wire_type);
        if elem == 0 {
            continue;
        }
        let value_bytes = elem.checked_mul(count)?;
        let data_offset = if value_bytes <= inline_max {
            value_field_off
        } else {
            cfg.read_offset(bytes, value_field_off)?
        };
        if reader::window(bytes, data_offset, value_bytes).is_none() {
            continue;
        }
        sink.push(BlockRef {
            format: ContainerFormat::Tiff,
            kind: if tag == TAG_XMP { BlockKind::Xmp } else { BlockKind::Icc },
            data_offset,
            data_size: value_bytes,
            id: u32::from(tag),
            ..BlockRef::default()
        });
    }

    let tail = entries_off + entry_count.checked_mul(entry_size)?;
    cfg.read_offset(bytes, tail)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn whole_file_plus_xmp_and_icc() {
        // Header, IFD with two entries: XMP BYTE[5] out-of-line at 38,
        // ICC UNDEFINED[4] inline.
        let mut file = b"II\x2A\x00\x08\x00\x00\x00".to_vec();
        file.extend_from_slice(&2u16.to_le_bytes()); // entry count
        // 0x02BC BYTE[5] -> offset 38
        file.extend_from_slice(&0x02BCu16.to_le_bytes());
        file.extend_from_slice(&1u16.to_le_bytes());
        file.extend_from_slice(&5u32.to_le_bytes());
        file.extend_from_slice(&38u32.to_le_bytes());
        // 0x8773 UNDEFINED[4] inline "ABCD"
        file.extend_from_slice(&0x8773u16.to_le_bytes());
        file.extend_from_slice(&7u16.to_le_bytes());
        file.extend_from_slice(&4u32.to_le_bytes());
        file.extend_from_slice(b"ABCD");
        file.extend_from_slice(&0u32.to_le_bytes()); // next IFD
        file.extend_from_slice(b"<xmp>");
        assert_eq!(file.len(), 43);

        let mut out = [BlockRef::default(); 4];
        let result = scan_tiff(&file, &mut out);
        assert_eq!(result.status, DecodeStatus::Ok);
        assert_eq!(result.written, 3);
        assert_eq!(out[0].kind, BlockKind::Exif);
        assert_eq!(out[0].data_size, file.len() as u64);
        assert_eq!(out[1].kind, BlockKind::Xmp);
        assert_eq!(&file[out[1].data_offset as usize..][..5], b"<xmp>");
        assert_eq!(out[2].kind, BlockKind::Icc);
        assert_eq!(&file[out[2].data_offset as usize..][..4], b"ABCD");
    }

    #[test]
    fn self_referencing_next_ifd_terminates() {
        let mut file = b"II\x2A\x00\x08\x00\x00\x00".to_vec();
        file.extend_from_slice(&0u16.to_le_bytes()); // zero entries
        file.extend_from_slice(&8u32.to_le_bytes()); // next IFD = itself
        let mut out = [BlockRef::default(); 2];
        let result = scan_tiff(&file, &mut out);
        assert_eq!(result.status, DecodeStatus::Ok);
        assert_eq!(result.written, 1);
    }

    #[test]
    fn not_a_tiff() {
        let mut out = [BlockRef::default(); 1];
        assert_eq!(scan_tiff(b"notatiff", &mut out).status, DecodeStatus::Unsupported);
    }
}
