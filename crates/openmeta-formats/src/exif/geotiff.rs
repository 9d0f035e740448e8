//! GeoTIFF key derivation.
//!
//! GeoTIFF parks projection metadata in three sibling tags:
//! `GeoKeyDirectory` (0x87AF, SHORT[4*(n+1)]), `GeoDoubleParams` (0x87B0,
//! DOUBLE[]) and `GeoAsciiParams` (0x87B1, ASCII). Each directory row
//! `(key_id, location, count, value_offset)` resolves to a literal, a
//! double slice or an ASCII slice; one derived entry per key.

use openmeta_core::{
    reader, DecodeStatus, ElemType, Entry, EntryFlags, EntryOrigin, MetaKey, MetaStore, MetaValue,
    TextEncoding, TiffConfig, WireType,
};

use super::classic::{IfdValueRef, RawIfdEntry};
use super::{ExifDecodeOptions, ExifDecodeResult};

const LOC_INLINE: u16 = 0;
const LOC_DOUBLE_PARAMS: u16 = 0x87B0;
const LOC_ASCII_PARAMS: u16 = 0x87B1;

/// Decode a GeoKeyDirectory into one derived block of
/// [`MetaKey::GeoTiffKey`] entries.
#[allow(clippy::too_many_arguments)]
pub(crate) fn decode_geo_keys(
    cfg: TiffConfig,
    bytes: &[u8],
    dir_raw: &RawIfdEntry,
    dir_vref: &IfdValueRef,
    doubles: Option<IfdValueRef>,
    ascii: Option<IfdValueRef>,
    store: &mut MetaStore,
    options: &ExifDecodeOptions,
    result: &mut ExifDecodeResult,
) {
    // Directory header: version, revision, minor revision, key count.
    if dir_raw.count < 4 {
        result.update(DecodeStatus::Malformed);
        return;
    }
    let Some(declared_keys) = cfg.read_u16(bytes, dir_vref.value_off + 6) else {
        result.update(DecodeStatus::Malformed);
        return;
    };
    // Rows available on the wire, whatever the header claims.
    let wire_rows = (dir_raw.count / 4).saturating_sub(1);
    let rows = u64::from(declared_keys).min(wire_rows);

    let token = match store.arena_mut().intern(options.token("geotiff").as_bytes()) {
        Some(t) => t,
        None => return,
    };
    let block = store.add_block(openmeta_core::BlockInfo {
        token,
        parent: openmeta_core::BlockId::INVALID,
        wire_offset: dir_vref.value_off,
        derived: true,
    });
    if !block.is_valid() {
        return;
    }
    result.ifds_walked += 1;

    for row in 0..rows {
        if !result.entry_budget_left(&options.limits) {
            result.update(DecodeStatus::LimitExceeded);
            break;
        }
        let row_off = dir_vref.value_off + (4 + row * 4) * 2;
        let (Some(key_id), Some(location), Some(count), Some(value_offset)) = (
            cfg.read_u16(bytes, row_off),
            cfg.read_u16(bytes, row_off + 2),
            cfg.read_u16(bytes, row_off + 4),
            cfg.read_u16(bytes, row_off + 6),
        ) else {
            result.update(DecodeStatus::Malformed);
            break;
        };

        let (value, wire) = match location {
            LOC_INLINE => (Some(MetaValue::u16(value_offset)), WireType::tiff(3)),
            LOC_DOUBLE_PARAMS => (
                doubles.and_then(|d| {
                    read_doubles(cfg, bytes, &d, u64::from(value_offset), u64::from(count), store)
                }),
                WireType::tiff(12),
            ),
            LOC_ASCII_PARAMS => (
                ascii.and_then(|a| {
                    read_ascii(bytes, &a, u64::from(value_offset), u64::from(count), store)
                }),
                WireType::tiff(2),
            ),
            _ => {
                result.update(DecodeStatus::Malformed);
                continue;
            }
        };
        let Some(value) = value else {
            result.update(DecodeStatus::Malformed);
            continue;
        };

        store.add_entry(Entry {
            key: MetaKey::GeoTiffKey(key_id),
            value,
            origin: EntryOrigin {
                block,
                order_in_block: row as u32,
                wire,
                wire_count: u32::from(count),
            },
            flags: EntryFlags::DERIVED,
        });
        result.entries_emitted += 1;
    }
}

/// Slice `count` doubles out of GeoDoubleParams starting at `index`.
fn read_doubles(
    cfg: TiffConfig,
    bytes: &[u8],
    params: &IfdValueRef,
    index: u64,
    count: u64,
    store: &mut MetaStore,
) -> Option<MetaValue> {
    let byte_off = index.checked_mul(8)?;
    let byte_len = count.checked_mul(8)?;
    if byte_off.checked_add(byte_len)? > params.value_bytes {
        return None;
    }
    let src = params.value_off + byte_off;
    if count == 1 {
        return reader::read_f64(bytes, src, cfg.byte_order).map(MetaValue::f64);
    }
    let span = store.arena_mut().allocate(u32::try_from(byte_len).ok()?, 1)?;
    for i in 0..count {
        let v = cfg.read_u64(bytes, src + i * 8)?;
        let dst = (i * 8) as usize;
        store.arena_mut().span_mut(span)[dst..dst + 8].copy_from_slice(&v.to_le_bytes());
    }
    Some(MetaValue::array(ElemType::F64, count as u32, span))
}

/// Slice `count` chars out of GeoAsciiParams, trimming the trailing `|`
/// separator and NULs.
fn read_ascii(
    bytes: &[u8],
    params: &IfdValueRef,
    index: u64,
    count: u64,
    store: &mut MetaStore,
) -> Option<MetaValue> {
    if index.checked_add(count)? > params.value_bytes {
        return None;
    }
    let window = reader::window(bytes, params.value_off + index, count)?;
    let end = window
        .iter()
        .rposition(|&b| b != 0 && b != b'|')
        .map_or(0, |p| p + 1);
    let span = store.arena_mut().intern(&window[..end])?;
    Some(MetaValue::text(span, TextEncoding::Ascii))
}

#[cfg(test)]
mod tests {
    use super::*;
    use openmeta_core::{ByteOrder, MetaStore, ValueKind};

    use crate::exif::decode_exif_tiff;

    /// TIFF with a GeoKeyDirectory of three keys: inline, double, ascii.
    fn geotiff_file() -> Vec<u8> {
        let mut t = b"II\x2A\x00\x08\x00\x00\x00".to_vec();
        // IFD0 @8: 3 entries, next = 0
        t.extend_from_slice(&3u16.to_le_bytes());
        // 0x87AF SHORT[16] -> offset 50
        t.extend_from_slice(&0x87AFu16.to_le_bytes());
        t.extend_from_slice(&3u16.to_le_bytes());
        t.extend_from_slice(&16u32.to_le_bytes());
        t.extend_from_slice(&50u32.to_le_bytes());
        // 0x87B0 DOUBLE[1] -> offset 82
        t.extend_from_slice(&0x87B0u16.to_le_bytes());
        t.extend_from_slice(&12u16.to_le_bytes());
        t.extend_from_slice(&1u32.to_le_bytes());
        t.extend_from_slice(&82u32.to_le_bytes());
        // 0x87B1 ASCII[8] -> offset 90
        t.extend_from_slice(&0x87B1u16.to_le_bytes());
        t.extend_from_slice(&2u16.to_le_bytes());
        t.extend_from_slice(&8u32.to_le_bytes());
        t.extend_from_slice(&90u32.to_le_bytes());
        t.extend_from_slice(&0u32.to_le_bytes());
        assert_eq!(t.len(), 50);
        // GeoKeyDirectory: header (1,1,0,3) + three rows.
        for v in [1u16, 1, 0, 3] {
            t.extend_from_slice(&v.to_le_bytes());
        }
        for v in [1024u16, 0, 1, 2] {
            t.extend_from_slice(&v.to_le_bytes()); // GTModelType = 2, inline
        }
        for v in [2059u16, 0x87B0, 1, 0] {
            t.extend_from_slice(&v.to_le_bytes()); // double param 0
        }
        for v in [1026u16, 0x87B1, 7, 0] {
            t.extend_from_slice(&v.to_le_bytes()); // ascii [0..7]
        }
        assert_eq!(t.len(), 82);
        t.extend_from_slice(&298.25f64.to_le_bytes());
        t.extend_from_slice(b"WGS 84|\x00");
        t
    }

    #[test]
    fn derives_three_keys() {
        let file = geotiff_file();
        let mut store = MetaStore::new();
        let options = ExifDecodeOptions::default();
        let result = decode_exif_tiff(
            &file,
            openmeta_core::TiffConfig::classic(ByteOrder::LittleEndian),
            8,
            &mut store,
            &options,
        );
        assert_eq!(result.status, DecodeStatus::Ok);

        let geo: Vec<_> = store
            .iter()
            .filter(|(_, e)| matches!(e.key, MetaKey::GeoTiffKey(_)))
            .map(|(_, e)| *e)
            .collect();
        assert_eq!(geo.len(), 3);
        assert!(geo.iter().all(|e| e.flags.contains(EntryFlags::DERIVED)));

        assert_eq!(geo[0].key, MetaKey::GeoTiffKey(1024));
        assert_eq!(geo[0].value.as_u32(), Some(2));

        assert_eq!(geo[1].key, MetaKey::GeoTiffKey(2059));
        assert_eq!(geo[1].value.as_f64(), Some(298.25));

        assert_eq!(geo[2].key, MetaKey::GeoTiffKey(1026));
        assert_eq!(geo[2].value.kind, ValueKind::Text);
        let span = geo[2].value.span().unwrap();
        assert_eq!(store.arena().span(span), b"WGS 84");
    }
}
