//! BMFF (ISO base media) box scanner.
//!
//! Covers every box-structured format this library reads:
//! - HEIF/AVIF: `meta/iinf/infe` item table + `iloc` extents (+ `idat`)
//! - Canon CR3: `moov/uuid(Canon)/CMT1..CMT4` TIFF streams
//! - JP2: `jp2h/colr` (method 2 = restricted ICC) and XMP `uuid`
//! - JXL container: `Exif`, `xml `, `brob` boxes
//!
//! Box header: u32 BE size + fourcc; size 1 pulls a u64 largesize, size 0
//! extends to the end of the enclosing span.

use openmeta_core::{reader, ByteOrder, DecodeStatus};

use crate::block::{
    BlockChunking, BlockCompression, BlockKind, BlockRef, BlockSink, ContainerFormat, ScanResult,
};

/// Canon's uuid carrying the CMT metadata boxes in CR3 moov.
const CANON_UUID: [u8; 16] = [
    0x85, 0xC0, 0xB6, 0x87, 0x82, 0x0F, 0x11, 0xE0, 0x81, 0x11, 0xF4, 0xCE, 0x46, 0x2B, 0x6A, 0x48,
];

/// Adobe's XMP box uuid.
const XMP_UUID: [u8; 16] = [
    0xBE, 0x7A, 0xCF, 0xCB, 0x97, 0xA9, 0x42, 0xE8, 0x9C, 0x71, 0x99, 0x94, 0x91, 0xE3, 0xAF, 0xAC,
];

/// One parsed box header.
#[derive(Debug, Clone, Copy)]
struct BmffBox {
    fourcc: [u8; 4],
    payload_off: u64,
    payload_len: u64,
    /// Offset just past this box.
    end: u64,
}

/// Parse the box at `pos`, bounded by `limit`. `None` at a clean end,
/// `Some(Err(()))` on a malformed header.
fn read_box(bytes: &[u8], pos: u64, limit: u64) -> Option<Result<BmffBox, ()>> {
    if pos >= limit {
        return None;
    }
    if pos + 8 > limit {
        return Some(Err(()));
    }
    let size32 = reader::read_u32(bytes, pos, ByteOrder::BigEndian)?;
    let mut fourcc = [0u8; 4];
    fourcc.copy_from_slice(reader::window(bytes, pos + 4, 4)?);

    let (payload_off, end) = match size32 {
        0 => (pos + 8, limit),
        1 => {
            let Some(large) = reader::read_u64(bytes, pos + 8, ByteOrder::BigEndian) else {
                return Some(Err(()));
            };
            if large < 16 || pos.checked_add(large).is_none_or(|e| e > limit) {
                return Some(Err(()));
            }
            (pos + 16, pos + large)
        }
        2..=7 => return Some(Err(())),
        _ => {
            let size = u64::from(size32);
            if pos + size > limit {
                return Some(Err(()));
            }
            (pos + 8, pos + size)
        }
    };
    Some(Ok(BmffBox {
        fourcc,
        payload_off,
        payload_len: end - payload_off,
        end,
    }))
}

/// Iterate direct children of `[start, limit)`, calling `f` per box. Returns
/// false when a malformed header stopped the walk.
fn walk_boxes(bytes: &[u8], start: u64, limit: u64, mut f: impl FnMut(&BmffBox)) -> bool {
    let mut pos = start;
    while let Some(result) = read_box(bytes, pos, limit) {
        match result {
            Ok(b) => {
                f(&b);
                if b.end <= pos {
                    return false;
                }
                pos = b.end;
            }
            Err(()) => return false,
        }
    }
    true
}

/// Scan a box-structured file (HEIF/AVIF/CR3/JP2/JXL) for metadata blocks.
pub fn scan_bmff(bytes: &[u8], out: &mut [BlockRef]) -> ScanResult {
    let mut sink = BlockSink::new(out);
    let mut status = DecodeStatus::Ok;
    let limit = bytes.len() as u64;

    let format = detect_bmff_format(bytes);
    if format == ContainerFormat::Unknown {
        status.merge(DecodeStatus::Unsupported);
        return sink.finish(status);
    }

    let clean = match format {
        ContainerFormat::Jxl => scan_jxl_boxes(bytes, limit, &mut sink, &mut status),
        ContainerFormat::Jp2 => scan_jp2_boxes(bytes, limit, &mut sink, &mut status),
        ContainerFormat::Cr3 => scan_cr3_boxes(bytes, limit, &mut sink, &mut status),
        _ => scan_heif_boxes(bytes, limit, format, &mut sink, &mut status),
    };
    if !clean {
        status.merge(DecodeStatus::Malformed);
    }
    sink.finish(status)
}

/// Classify a BMFF file by signature box / ftyp major brand.
pub(crate) fn detect_bmff_format(bytes: &[u8]) -> ContainerFormat {
    // JP2 and JXL start with a fixed signature box before ftyp.
    if reader::match_bytes(bytes, 0, &[0x00, 0x00, 0x00, 0x0C])
        && reader::match_bytes(bytes, 4, b"jP  \x0D\x0A\x87\x0A")
    {
        return ContainerFormat::Jp2;
    }
    if reader::match_bytes(bytes, 0, &[0x00, 0x00, 0x00, 0x0C])
        && reader::match_bytes(bytes, 4, b"JXL \x0D\x0A\x87\x0A")
    {
        return ContainerFormat::Jxl;
    }
    if !reader::match_bytes(bytes, 4, b"ftyp") {
        return ContainerFormat::Unknown;
    }
    let Some(brand) = reader::window(bytes, 8, 4) else {
        return ContainerFormat::Unknown;
    };
    match brand {
        b"heic" | b"heix" | b"hevc" | b"hevx" | b"mif1" | b"msf1" => ContainerFormat::Heif,
        b"avif" | b"avis" => ContainerFormat::Avif,
        b"crx " => ContainerFormat::Cr3,
        b"jp2 " => ContainerFormat::Jp2,
        b"jxl " => ContainerFormat::Jxl,
        _ => ContainerFormat::Heif,
    }
}

/// JXL container: metadata boxes sit at the top level.
fn scan_jxl_boxes(
    bytes: &[u8],
    limit: u64,
    sink: &mut BlockSink<'_>,
    status: &mut DecodeStatus,
) -> bool {
    walk_boxes(bytes, 0, limit, |b| match &b.fourcc {
        b"Exif" => push_exif_with_tiff_prefix(bytes, b, ContainerFormat::Jxl, sink, status),
        b"xml " => sink.push(BlockRef {
            format: ContainerFormat::Jxl,
            kind: BlockKind::Xmp,
            data_offset: b.payload_off,
            data_size: b.payload_len,
            id: fourcc_u32(b.fourcc),
            ..BlockRef::default()
        }),
        b"brob" => {
            // Inner fourcc names the compressed box; payload is brotli.
            let Some(inner) = reader::window(bytes, b.payload_off, 4) else {
                status.merge(DecodeStatus::Malformed);
                return;
            };
            let mut inner4 = [0u8; 4];
            inner4.copy_from_slice(inner);
            sink.push(BlockRef {
                format: ContainerFormat::Jxl,
                kind: BlockKind::CompressedMetadata,
                data_offset: b.payload_off + 4,
                data_size: b.payload_len.saturating_sub(4),
                compression: BlockCompression::Brotli,
                id: fourcc_u32(b.fourcc),
                aux_u32: fourcc_u32(inner4),
                ..BlockRef::default()
            });
        }
        _ => {}
    })
}

/// JP2: `jp2h/colr` method 2 carries an ICC profile; XMP rides a uuid box.
fn scan_jp2_boxes(
    bytes: &[u8],
    limit: u64,
    sink: &mut BlockSink<'_>,
    status: &mut DecodeStatus,
) -> bool {
    walk_boxes(bytes, 0, limit, |b| match &b.fourcc {
        b"jp2h" => {
            walk_boxes(bytes, b.payload_off, b.end, |child| {
                if &child.fourcc == b"colr" && child.payload_len > 3 {
                    let method = reader::read_u8(bytes, child.payload_off).unwrap_or(0);
                    // Method 2 (restricted ICC) and 3 (any ICC): profile
                    // follows meth/prec/approx bytes.
                    if method == 2 || method == 3 {
                        sink.push(BlockRef {
                            format: ContainerFormat::Jp2,
                            kind: BlockKind::Icc,
                            data_offset: child.payload_off + 3,
                            data_size: child.payload_len - 3,
                            id: fourcc_u32(child.fourcc),
                            ..BlockRef::default()
                        });
                    }
                }
            });
        }
        b"uuid" => push_uuid_xmp(bytes, b, ContainerFormat::Jp2, sink, status),
        _ => {}
    })
}

/// CR3: Canon parks TIFF streams in `moov/uuid(Canon)/CMT1..CMT4`.
fn scan_cr3_boxes(
    bytes: &[u8],
    limit: u64,
    sink: &mut BlockSink<'_>,
    status: &mut DecodeStatus,
) -> bool {
    walk_boxes(bytes, 0, limit, |b| match &b.fourcc {
        b"moov" => {
            walk_boxes(bytes, b.payload_off, b.end, |child| {
                if &child.fourcc != b"uuid" || child.payload_len < 16 {
                    return;
                }
                if !reader::match_bytes(bytes, child.payload_off, &CANON_UUID) {
                    return;
                }
                walk_boxes(bytes, child.payload_off + 16, child.end, |cmt| {
                    if matches!(&cmt.fourcc, b"CMT1" | b"CMT2" | b"CMT3" | b"CMT4") {
                        sink.push(BlockRef {
                            format: ContainerFormat::Cr3,
                            kind: BlockKind::Exif,
                            data_offset: cmt.payload_off,
                            data_size: cmt.payload_len,
                            id: fourcc_u32(cmt.fourcc),
                            ..BlockRef::default()
                        });
                    }
                });
            });
        }
        b"uuid" => push_uuid_xmp(bytes, b, ContainerFormat::Cr3, sink, status),
        _ => {}
    })
}

/// One item declared in `iinf`.
#[derive(Debug, Clone, Copy)]
struct HeifItem {
    item_id: u32,
    kind: BlockKind,
    id: u32,
}

/// One location from `iloc`.
#[derive(Debug, Clone, Copy)]
struct HeifLocation {
    item_id: u32,
    construction_method: u8,
    base_offset: u64,
    extent_offset: u64,
    extent_len: u64,
}

/// HEIF/AVIF: resolve `meta/iinf` items through `iloc` (+ `idat`).
fn scan_heif_boxes(
    bytes: &[u8],
    limit: u64,
    format: ContainerFormat,
    sink: &mut BlockSink<'_>,
    status: &mut DecodeStatus,
) -> bool {
    let mut items: Vec<HeifItem> = Vec::new();
    let mut locations: Vec<HeifLocation> = Vec::new();
    let mut idat_off: Option<u64> = None;

    let clean = walk_boxes(bytes, 0, limit, |b| {
        if &b.fourcc != b"meta" {
            return;
        }
        // meta is a fullbox: 4 bytes of version/flags before children.
        walk_boxes(bytes, b.payload_off + 4, b.end, |child| match &child.fourcc {
            b"iinf" => parse_iinf(bytes, child, &mut items, status),
            b"iloc" => parse_iloc(bytes, child, &mut locations, status),
            b"idat" => idat_off = Some(child.payload_off),
            _ => {}
        });
    });

    for item in &items {
        let Some(loc) = locations.iter().find(|l| l.item_id == item.item_id) else {
            continue;
        };
        let abs = match loc.construction_method {
            0 => loc.base_offset.wrapping_add(loc.extent_offset),
            1 => match idat_off {
                Some(idat) => idat
                    .wrapping_add(loc.base_offset)
                    .wrapping_add(loc.extent_offset),
                None => {
                    status.merge(DecodeStatus::Malformed);
                    continue;
                }
            },
            _ => continue,
        };
        if reader::window(bytes, abs, loc.extent_len).is_none() {
            status.merge(DecodeStatus::Malformed);
            continue;
        }
        match item.kind {
            BlockKind::Exif => {
                let synth = BmffBox {
                    fourcc: *b"Exif",
                    payload_off: abs,
                    payload_len: loc.extent_len,
                    end: abs + loc.extent_len,
                };
                push_exif_with_tiff_prefix(bytes, &synth, format, sink, status);
            }
            _ => sink.push(BlockRef {
                format,
                kind: item.kind,
                data_offset: abs,
                data_size: loc.extent_len,
                id: item.id,
                ..BlockRef::default()
            }),
        }
    }
    clean
}

fn parse_iinf(
    bytes: &[u8],
    iinf: &BmffBox,
    items: &mut Vec<HeifItem>,
    status: &mut DecodeStatus,
) {
    let version = reader::read_u8(bytes, iinf.payload_off).unwrap_or(0);
    let entries_off = if version == 0 {
        iinf.payload_off + 4 + 2
    } else {
        iinf.payload_off + 4 + 4
    };
    walk_boxes(bytes, entries_off, iinf.end, |infe| {
        if &infe.fourcc != b"infe" {
            return;
        }
        let Some(v) = reader::read_u8(bytes, infe.payload_off) else {
            return;
        };
        if v < 2 {
            return;
        }
        let mut pos = infe.payload_off + 4;
        let item_id = if v == 2 {
            let Some(id) = reader::read_u16(bytes, pos, ByteOrder::BigEndian) else {
                return;
            };
            pos += 2;
            u32::from(id)
        } else {
            let Some(id) = reader::read_u32(bytes, pos, ByteOrder::BigEndian) else {
                return;
            };
            pos += 4;
            id
        };
        pos += 2; // item_protection_index
        let Some(item_type) = reader::window(bytes, pos, 4) else {
            status.merge(DecodeStatus::Malformed);
            return;
        };
        let mut fourcc = [0u8; 4];
        fourcc.copy_from_slice(item_type);
        pos += 4;
        match &fourcc {
            b"Exif" => items.push(HeifItem {
                item_id,
                kind: BlockKind::Exif,
                id: fourcc_u32(fourcc),
            }),
            b"mime" => {
                // item_name NUL-string, then content_type NUL-string.
                let Some(name_end) = find_nul(bytes, pos, infe.end) else {
                    return;
                };
                let ct_start = name_end + 1;
                let ct_end = find_nul(bytes, ct_start, infe.end).unwrap_or(infe.end);
                let Some(ct) = reader::window(bytes, ct_start, ct_end - ct_start) else {
                    return;
                };
                if ct == b"application/rdf+xml" {
                    items.push(HeifItem {
                        item_id,
                        kind: BlockKind::Xmp,
                        id: fourcc_u32(fourcc),
                    });
                }
            }
            _ => {}
        }
    });
}

fn parse_iloc(
    bytes: &[u8],
    iloc: &BmffBox,
    locations: &mut Vec<HeifLocation>,
    status: &mut DecodeStatus,
) {
    let Some(version) = reader::read_u8(bytes, iloc.payload_off) else {
        return;
    };
    let mut pos = iloc.payload_off + 4;
    let Some(sizes) = reader::read_u16(bytes, pos, ByteOrder::BigEndian) else {
        return;
    };
    pos += 2;
    let offset_size = u64::from((sizes >> 12) & 0xF);
    let length_size = u64::from((sizes >> 8) & 0xF);
    let base_offset_size = u64::from((sizes >> 4) & 0xF);
    let index_size = if version >= 1 { u64::from(sizes & 0xF) } else { 0 };

    let item_count = if version < 2 {
        let Some(n) = reader::read_u16(bytes, pos, ByteOrder::BigEndian) else {
            return;
        };
        pos += 2;
        u32::from(n)
    } else {
        let Some(n) = reader::read_u32(bytes, pos, ByteOrder::BigEndian) else {
            return;
        };
        pos += 4;
        n
    };

    for _ in 0..item_count {
        let item_id = if version < 2 {
            let Some(id) = reader::read_u16(bytes, pos, ByteOrder::BigEndian) else {
                status.merge(DecodeStatus::Malformed);
                return;
            };
            pos += 2;
            u32::from(id)
        } else {
            let Some(id) = reader::read_u32(bytes, pos, ByteOrder::BigEndian) else {
                status.merge(DecodeStatus::Malformed);
                return;
            };
            pos += 4;
            id
        };
        let mut construction_method = 0u8;
        if version >= 1 {
            let Some(cm) = reader::read_u16(bytes, pos, ByteOrder::BigEndian) else {
                return;
            };
            construction_method = (cm & 0xF) as u8;
            pos += 2;
        }
        pos += 2; // data_reference_index
        let Some(base_offset) = read_sized(bytes, pos, base_offset_size) else {
            return;
        };
        pos += base_offset_size;
        let Some(extent_count) = reader::read_u16(bytes, pos, ByteOrder::BigEndian) else {
            return;
        };
        pos += 2;

        let mut first: Option<(u64, u64)> = None;
        for i in 0..extent_count {
            pos += index_size;
            let Some(extent_offset) = read_sized(bytes, pos, offset_size) else {
                return;
            };
            pos += offset_size;
            let Some(extent_len) = read_sized(bytes, pos, length_size) else {
                return;
            };
            pos += length_size;
            if i == 0 {
                first = Some((extent_offset, extent_len));
            }
        }
        if let Some((extent_offset, extent_len)) = first {
            locations.push(HeifLocation {
                item_id,
                construction_method,
                base_offset,
                extent_offset,
                extent_len,
            });
        }
    }
}

/// Read a 0/4/8-byte big-endian field as declared by iloc size nibbles.
fn read_sized(bytes: &[u8], pos: u64, size: u64) -> Option<u64> {
    match size {
        0 => Some(0),
        4 => reader::read_u32(bytes, pos, ByteOrder::BigEndian).map(u64::from),
        8 => reader::read_u64(bytes, pos, ByteOrder::BigEndian),
        _ => None,
    }
}

/// Emit a BMFF Exif payload: u32 BE prefix locates the TIFF header.
fn push_exif_with_tiff_prefix(
    bytes: &[u8],
    b: &BmffBox,
    format: ContainerFormat,
    sink: &mut BlockSink<'_>,
    status: &mut DecodeStatus,
) {
    let Some(prefix) = reader::read_u32(bytes, b.payload_off, ByteOrder::BigEndian) else {
        status.merge(DecodeStatus::Malformed);
        return;
    };
    let skip = 4u64 + u64::from(prefix);
    if skip > b.payload_len {
        status.merge(DecodeStatus::Malformed);
        return;
    }
    sink.push(BlockRef {
        format,
        kind: BlockKind::Exif,
        data_offset: b.payload_off + skip,
        data_size: b.payload_len - skip,
        chunking: BlockChunking::BmffExifTiffOffsetU32Be,
        id: fourcc_u32(b.fourcc),
        aux_u32: prefix,
        ..BlockRef::default()
    });
}

/// Emit an XMP uuid box if its uuid matches Adobe's.
fn push_uuid_xmp(
    bytes: &[u8],
    b: &BmffBox,
    format: ContainerFormat,
    sink: &mut BlockSink<'_>,
    _status: &mut DecodeStatus,
) {
    if b.payload_len < 16 || !reader::match_bytes(bytes, b.payload_off, &XMP_UUID) {
        return;
    }
    sink.push(BlockRef {
        format,
        kind: BlockKind::Xmp,
        data_offset: b.payload_off + 16,
        data_size: b.payload_len - 16,
        id: fourcc_u32(b.fourcc),
        ..BlockRef::default()
    });
}

fn find_nul(bytes: &[u8], start: u64, limit: u64) -> Option<u64> {
    let window = reader::window(bytes, start, limit.checked_sub(start)?)?;
    window.iter().position(|&b| b == 0).map(|p| start + p as u64)
}

#[inline]
fn fourcc_u32(fourcc: [u8; 4]) -> u32 {
    u32::from_be_bytes(fourcc)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn boxed(fourcc: &[u8; 4], payload: &[u8]) -> Vec<u8> {
        let mut b = ((payload.len() + 8) as u32).to_be_bytes().to_vec();
        b.extend_from_slice(fourcc);
        b.extend_from_slice(payload);
        b
    }

    fn fullbox(fourcc: &[u8; 4], version: u8, payload: &[u8]) -> Vec<u8> {
        let mut inner = vec![version, 0, 0, 0];
        inner.extend_from_slice(payload);
        boxed(fourcc, &inner)
    }

    fn infe_exif(item_id: u16) -> Vec<u8> {
        let mut p = item_id.to_be_bytes().to_vec();
        p.extend_from_slice(&[0, 0]); // protection
        p.extend_from_slice(b"Exif");
        p.push(0); // empty name
        fullbox(b"infe", 2, &p)
    }

    fn infe_mime(item_id: u16, content_type: &[u8]) -> Vec<u8> {
        let mut p = item_id.to_be_bytes().to_vec();
        p.extend_from_slice(&[0, 0]);
        p.extend_from_slice(b"mime");
        p.push(0); // empty name
        p.extend_from_slice(content_type);
        p.push(0);
        fullbox(b"infe", 2, &p)
    }

    /// iloc v1, idat-relative (construction method 1), 4-byte fields.
    fn iloc_idat(entries: &[(u16, u32, u32)]) -> Vec<u8> {
        let mut p = vec![0x44, 0x00]; // offset_size=4, length_size=4, base=0
        p.extend_from_slice(&(entries.len() as u16).to_be_bytes());
        for &(item_id, off, len) in entries {
            p.extend_from_slice(&item_id.to_be_bytes());
            p.extend_from_slice(&1u16.to_be_bytes()); // method 1 = idat
            p.extend_from_slice(&0u16.to_be_bytes()); // data ref index
            p.extend_from_slice(&1u16.to_be_bytes()); // extent count
            p.extend_from_slice(&off.to_be_bytes());
            p.extend_from_slice(&len.to_be_bytes());
        }
        fullbox(b"iloc", 1, &p)
    }

    #[test]
    fn heif_meta_items_resolve_through_idat() {
        // Exif item payload: u32 prefix 0, then a TIFF header.
        let mut idat = 0u32.to_be_bytes().to_vec();
        idat.extend_from_slice(b"II\x2A\x00\x08\x00\x00\x00");
        let exif_len = idat.len() as u32;
        let xmp_off = idat.len() as u32;
        idat.extend_from_slice(b"<rdf/>");

        let mut iinf_payload = 2u16.to_be_bytes().to_vec();
        iinf_payload.extend_from_slice(&infe_exif(1));
        iinf_payload.extend_from_slice(&infe_mime(2, b"application/rdf+xml"));

        let mut meta_payload = fullbox(b"iinf", 0, &iinf_payload);
        meta_payload.extend_from_slice(&iloc_idat(&[(1, 0, exif_len), (2, xmp_off, 6)]));
        meta_payload.extend_from_slice(&boxed(b"idat", &idat));

        let mut file = boxed(b"ftyp", b"heicmif1");
        file.extend_from_slice(&fullbox(b"meta", 0, &meta_payload));

        let mut out = [BlockRef::default(); 4];
        let result = scan_bmff(&file, &mut out);
        assert_eq!(result.status, DecodeStatus::Ok);
        assert_eq!(result.written, 2);
        assert_eq!(out[0].kind, BlockKind::Exif);
        assert_eq!(out[1].kind, BlockKind::Xmp);
        // Exif window starts past the 4-byte TIFF-offset prefix.
        let exif_window = &file[out[0].data_offset as usize..][..out[0].data_size as usize];
        assert_eq!(&exif_window[..4], b"II\x2A\x00");
        let xmp_window = &file[out[1].data_offset as usize..][..out[1].data_size as usize];
        assert_eq!(xmp_window, b"<rdf/>");
    }

    #[test]
    fn cr3_cmt_boxes() {
        let tiff = b"II\x2A\x00\x08\x00\x00\x00";
        let mut uuid_payload = CANON_UUID.to_vec();
        uuid_payload.extend_from_slice(&boxed(b"CMT1", tiff));
        uuid_payload.extend_from_slice(&boxed(b"CMT2", tiff));
        let moov = boxed(b"moov", &boxed(b"uuid", &uuid_payload));
        let mut file = boxed(b"ftyp", b"crx clear");
        file.extend_from_slice(&moov);

        let mut out = [BlockRef::default(); 4];
        let result = scan_bmff(&file, &mut out);
        assert_eq!(result.written, 2);
        assert_eq!(out[0].format, ContainerFormat::Cr3);
        assert_eq!(out[0].id, u32::from_be_bytes(*b"CMT1"));
        assert_eq!(out[1].id, u32::from_be_bytes(*b"CMT2"));
    }

    #[test]
    fn jxl_brob_records_inner_fourcc() {
        let mut file = boxed(b"JXL ", &[0x0D, 0x0A, 0x87, 0x0A]);
        file.extend_from_slice(&boxed(b"ftyp", b"jxl "));
        let mut brob = b"xml ".to_vec();
        brob.extend_from_slice(b"\x1b\x00\x00"); // opaque brotli bytes
        file.extend_from_slice(&boxed(b"brob", &brob));

        let mut out = [BlockRef::default(); 4];
        let result = scan_bmff(&file, &mut out);
        assert_eq!(result.written, 1);
        assert_eq!(out[0].kind, BlockKind::CompressedMetadata);
        assert_eq!(out[0].compression, BlockCompression::Brotli);
        assert_eq!(out[0].aux_u32, u32::from_be_bytes(*b"xml "));
    }

    #[test]
    fn jp2_colr_icc() {
        let mut colr = vec![2u8, 0, 0]; // method 2 = restricted ICC
        colr.extend_from_slice(b"PROFILE");
        let jp2h = boxed(b"jp2h", &boxed(b"colr", &colr));
        let mut file = boxed(b"jP  ", &[0x0D, 0x0A, 0x87, 0x0A]);
        file.extend_from_slice(&boxed(b"ftyp", b"jp2 "));
        file.extend_from_slice(&jp2h);

        let mut out = [BlockRef::default(); 4];
        let result = scan_bmff(&file, &mut out);
        assert_eq!(result.written, 1);
        assert_eq!(out[0].kind, BlockKind::Icc);
        assert_eq!(out[0].data_size, 7);
    }
}
