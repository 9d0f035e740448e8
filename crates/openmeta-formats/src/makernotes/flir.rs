//! FLIR thermal-camera MakerNote decoder.
//!
//! Two shapes: either a small classic IFD embedded in the note, or the
//! whole note is an FFF/AFF container - a header with a record directory
//! (32-byte entries) whose records have fixed layouts. Container
//! endianness is decided by the version word; record endianness
//! self-detects by probing a 2-byte magic.

use openmeta_core::{reader, BlockId, ByteOrder, DecodeStatus, EntryFlags, MetaStore, MetaValue, TextEncoding, TiffConfig};

use super::util::{self, TagListBuilder};
use super::{MkTokens, NoteContext};
use crate::exif::classic::{self, OffsetPolicy};
use crate::exif::{ExifDecodeLimits, ExifDecodeOptions, ExifDecodeResult};

const REC_RAW_DATA: u16 = 0x0001;
const REC_EMBEDDED_IMAGE: u16 = 0x000E;
const REC_CAMERA_INFO: u16 = 0x0020;
const REC_PALETTE_INFO: u16 = 0x0022;
const REC_PIP: u16 = 0x002A;
const REC_GPS_INFO: u16 = 0x002B;
const REC_METER_LINK: u16 = 0x002C;

const LE: ByteOrder = ByteOrder::LittleEndian;

pub(crate) fn detect(ctx: &NoteContext<'_>) -> bool {
    ctx.note_starts(b"FFF\0")
        || ctx.note_starts(b"AFF\0")
        || ctx.note_starts(b"FLIR\0")
        || ctx.make_has("FLIR")
}

pub(crate) fn decode(
    ctx: &NoteContext<'_>,
    mk: &MkTokens,
    store: &mut MetaStore,
    options: &ExifDecodeOptions,
    result: &mut ExifDecodeResult,
) -> bool {
    let note = ctx.note();
    if note.len() < 8 {
        return false;
    }

    if ctx.note_starts(b"FFF\0") || ctx.note_starts(b"AFF\0") {
        return decode_fff(note, mk, store, &options.limits, options, result);
    }

    // Embedded classic IFD: score both endiannesses at the note start.
    let mut best: Option<classic::ClassicIfdCandidate> = None;
    for order in [ctx.cfg.byte_order, flip(ctx.cfg.byte_order)] {
        let cfg = TiffConfig::classic(order);
        if let Some(cand) =
            classic::score_classic_ifd_candidate(cfg, ctx.tiff, ctx.note_off, &options.limits)
        {
            if best.is_none_or(|b| cand.valid_entries > b.valid_entries) {
                best = Some(cand);
            }
        }
    }
    let Some(best) = best else {
        return false;
    };
    let cfg = TiffConfig::classic(if best.le { LE } else { ByteOrder::BigEndian });
    classic::decode_ifd_no_header(
        cfg,
        ctx.tiff,
        ctx.note_off,
        &mk.ifd0,
        BlockId::INVALID,
        OffsetPolicy::absolute(),
        EntryFlags::NONE,
        store,
        options,
        result,
        |_, _| {},
    );
    true
}

/// Record endianness probe: a known u16 magic at `off` read both ways.
fn endian_by_magic(file_le: bool, rec: &[u8], off: u64, magic: u16) -> ByteOrder {
    let file_order = if file_le { LE } else { ByteOrder::BigEndian };
    match reader::read_u16(rec, off, file_order) {
        Some(v) if v == magic => file_order,
        Some(v) if v == magic.swap_bytes() => flip(file_order),
        _ => file_order,
    }
}

fn flip(order: ByteOrder) -> ByteOrder {
    match order {
        ByteOrder::LittleEndian => ByteOrder::BigEndian,
        ByteOrder::BigEndian => ByteOrder::LittleEndian,
    }
}

/// FFF/AFF container walk.
pub(crate) fn decode_fff(
    fff: &[u8],
    mk: &MkTokens,
    store: &mut MetaStore,
    limits: &ExifDecodeLimits,
    options: &ExifDecodeOptions,
    result: &mut ExifDecodeResult,
) -> bool {
    if fff.len() < 0x40 {
        result.update(DecodeStatus::Malformed);
        return false;
    }
    if !reader::match_bytes(fff, 0, b"FFF\0") && !reader::match_bytes(fff, 0, b"AFF\0") {
        return false;
    }

    // The version word at 0x14 reads as 100..199 in the file's byte order.
    let ver_be = reader::read_u32(fff, 0x14, ByteOrder::BigEndian).unwrap_or(0);
    let ver_le = reader::read_u32(fff, 0x14, LE).unwrap_or(0);
    let le = if (100..200).contains(&ver_be) {
        false
    } else if (100..200).contains(&ver_le) {
        true
    } else {
        result.update(DecodeStatus::Unsupported);
        return true;
    };
    let order = if le { LE } else { ByteOrder::BigEndian };

    let Some(dir_off) = reader::read_u32(fff, 0x18, order).map(u64::from) else {
        result.update(DecodeStatus::Malformed);
        return true;
    };
    let Some(dir_num) = reader::read_u32(fff, 0x1C, order).map(u64::from) else {
        result.update(DecodeStatus::Malformed);
        return true;
    };
    let Some(dir_bytes) = dir_num.checked_mul(0x20) else {
        result.update(DecodeStatus::LimitExceeded);
        return true;
    };
    if dir_off > fff.len() as u64 || dir_bytes > fff.len() as u64 - dir_off {
        result.update(DecodeStatus::Malformed);
        return true;
    }

    // Creator string from the container header.
    let mut header = TagListBuilder::new();
    header.push(0x0004, util::ascii_text(store.arena_mut(), fff, 0x04, 16));
    header.emit(&mk.subtable("fff_header", 0), store, options, result);

    let mut indices = [0u32; 7];
    for i in 0..dir_num {
        let entry_off = dir_off + i * 0x20;
        let Some(rec_type) = reader::read_u16(fff, entry_off, order) else {
            result.update(DecodeStatus::Malformed);
            return true;
        };
        if rec_type == 0 {
            continue;
        }
        let (Some(rec_off), Some(rec_len)) = (
            reader::read_u32(fff, entry_off + 0x0C, order).map(u64::from),
            reader::read_u32(fff, entry_off + 0x10, order).map(u64::from),
        ) else {
            result.update(DecodeStatus::Malformed);
            return true;
        };
        if rec_off > fff.len() as u64
            || rec_len > fff.len() as u64 - rec_off
            || rec_len > u64::from(limits.max_value_bytes)
        {
            continue;
        }
        let rec = &fff[rec_off as usize..(rec_off + rec_len) as usize];

        match rec_type {
            REC_RAW_DATA => {
                let name = mk.subtable("fff_rawdata", take_index(&mut indices, 0));
                decode_payload_record(rec, le, 0x0002, &name, store, options, result);
            }
            REC_EMBEDDED_IMAGE => {
                let name = mk.subtable("fff_embeddedimage", take_index(&mut indices, 1));
                decode_payload_record(rec, le, 0x0003, &name, store, options, result);
            }
            REC_CAMERA_INFO => {
                let name = mk.subtable("fff_camerainfo", take_index(&mut indices, 2));
                decode_camera_info(rec, le, &name, store, options, result);
            }
            REC_PALETTE_INFO => {
                let name = mk.subtable("fff_paletteinfo", take_index(&mut indices, 3));
                decode_palette_info(rec, le, &name, store, limits, options, result);
            }
            REC_PIP => {
                let name = mk.subtable("fff_pip", take_index(&mut indices, 4));
                decode_pip(rec, &name, store, options, result);
            }
            REC_GPS_INFO => {
                let name = mk.subtable("fff_gpsinfo", take_index(&mut indices, 5));
                decode_gps_info(rec, &name, store, options, result);
            }
            REC_METER_LINK => {
                let name = mk.subtable("fff_meterlink", take_index(&mut indices, 6));
                decode_meter_link(rec, &name, store, options, result);
            }
            _ => {}
        }
    }
    true
}

fn take_index(indices: &mut [u32; 7], slot: usize) -> u32 {
    let v = indices[slot];
    indices[slot] = v + 1;
    v
}

/// RawData / EmbeddedImage: dimensions plus a payload-type sniff at +0x20.
fn decode_payload_record(
    rec: &[u8],
    file_le: bool,
    magic: u16,
    ifd_name: &str,
    store: &mut MetaStore,
    options: &ExifDecodeOptions,
    result: &mut ExifDecodeResult,
) {
    let order = endian_by_magic(file_le, rec, 0, magic);
    let mut list = TagListBuilder::new();
    list.push(0x0001, util::u16_value(rec, 0x02, order)); // width
    list.push(0x0002, util::u16_value(rec, 0x04, order)); // height

    if rec.len() >= 0x20 + 4 {
        let payload = &rec[0x20..];
        let kind: &[u8] = if payload.starts_with(&[0x89, b'P', b'N', b'G']) {
            b"PNG"
        } else if payload.starts_with(&[0xFF, 0xD8, 0xFF]) {
            b"JPG"
        } else if payload.starts_with(b"II\x2A\x00") || payload.starts_with(b"MM\x00\x2A") {
            b"TIFF"
        } else {
            b"DAT"
        };
        let value = match store.arena_mut().intern(kind) {
            Some(span) => MetaValue::text(span, TextEncoding::Ascii),
            None => MetaValue::empty(),
        };
        list.push(0x0010, value);
    }
    list.emit(ifd_name, store, options, result);
}

/// PaletteInfo: colour counts, six RGB triplets, method bytes, two names,
/// and the palette itself.
fn decode_palette_info(
    rec: &[u8],
    le: bool,
    ifd_name: &str,
    store: &mut MetaStore,
    limits: &ExifDecodeLimits,
    options: &ExifDecodeOptions,
    result: &mut ExifDecodeResult,
) {
    let order = if le { LE } else { ByteOrder::BigEndian };
    let mut list = TagListBuilder::new();
    list.push(0x0000, util::u16_value(rec, 0x00, order)); // PaletteColors
    for off in [0x06u64, 0x09, 0x0C, 0x0F, 0x12, 0x15] {
        // AboveColor/BelowColor/OverflowColor/UnderflowColor/Isotherm1/2
        list.push(off as u16, util::u8_array(store.arena_mut(), rec, off, 3));
    }
    list.push(0x001A, util::u8_value(rec, 0x1A)); // PaletteMethod
    list.push(0x001B, util::u8_value(rec, 0x1B)); // PaletteStretch
    list.push(0x0030, util::ascii_text(store.arena_mut(), rec, 0x30, 32)); // PaletteFileName
    list.push(0x0050, util::ascii_text(store.arena_mut(), rec, 0x50, 32)); // PaletteName

    if let Some(colors) = reader::read_u16(rec, 0x00, order) {
        let palette_bytes = u64::from(colors) * 3;
        if palette_bytes > 0
            && rec.len() >= 0x70
            && palette_bytes <= u64::from(limits.max_value_bytes)
            && 0x70 + palette_bytes <= rec.len() as u64
        {
            list.push(0x0070, util::bytes_value(store.arena_mut(), rec, 0x70, palette_bytes));
        }
    }
    list.emit(ifd_name, store, options, result);
}

/// Picture-in-picture geometry, always little-endian.
fn decode_pip(
    rec: &[u8],
    ifd_name: &str,
    store: &mut MetaStore,
    options: &ExifDecodeOptions,
    result: &mut ExifDecodeResult,
) {
    let mut list = TagListBuilder::new();
    list.push(0x0000, util::f32_value(rec, 0, LE)); // Real2IR
    list.push(0x0002, util::i16_value(rec, 4, LE)); // OffsetX
    list.push(0x0003, util::i16_value(rec, 6, LE)); // OffsetY
    list.push(0x0004, util::i16_value(rec, 8, LE)); // PiPX1
    list.push(0x0005, util::i16_value(rec, 10, LE)); // PiPX2
    list.push(0x0006, util::i16_value(rec, 12, LE)); // PiPY1
    list.push(0x0007, util::i16_value(rec, 14, LE)); // PiPY2
    list.emit(ifd_name, store, options, result);
}

/// GPS record, always little-endian.
fn decode_gps_info(
    rec: &[u8],
    ifd_name: &str,
    store: &mut MetaStore,
    options: &ExifDecodeOptions,
    result: &mut ExifDecodeResult,
) {
    let mut list = TagListBuilder::new();
    list.push(0x0000, util::u32_value(rec, 0x00, LE)); // GPSValid
    list.push(0x0004, util::bytes_value(store.arena_mut(), rec, 0x04, 4)); // VersionID
    list.push(0x0008, util::ascii_text(store.arena_mut(), rec, 0x08, 2)); // LatitudeRef
    list.push(0x000A, util::ascii_text(store.arena_mut(), rec, 0x0A, 2)); // LongitudeRef
    if let Some(lat) = reader::read_f64(rec, 0x10, LE) {
        list.push(0x0010, MetaValue::f64(lat)); // Latitude
    }
    if let Some(lon) = reader::read_f64(rec, 0x18, LE) {
        list.push(0x0018, MetaValue::f64(lon)); // Longitude
    }
    list.push(0x0020, util::f32_value(rec, 0x20, LE)); // Altitude
    list.push(0x0040, util::f32_value(rec, 0x40, LE)); // DOP
    list.push(0x0044, util::ascii_text(store.arena_mut(), rec, 0x44, 2)); // SpeedRef
    list.push(0x0046, util::ascii_text(store.arena_mut(), rec, 0x46, 2)); // TrackRef
    list.push(0x0048, util::ascii_text(store.arena_mut(), rec, 0x48, 2)); // MeasureMode
    list.push(0x004C, util::f32_value(rec, 0x4C, LE)); // Speed
    list.push(0x0050, util::f32_value(rec, 0x50, LE)); // Track
    list.push(0x0054, util::f32_value(rec, 0x54, LE)); // MagneticVariation
    list.push(0x0058, util::ascii_text(store.arena_mut(), rec, 0x58, 16)); // MapDatum
    list.emit(ifd_name, store, options, result);
}

/// MeterLink external-sensor readings, always little-endian.
fn decode_meter_link(
    rec: &[u8],
    ifd_name: &str,
    store: &mut MetaStore,
    options: &ExifDecodeOptions,
    result: &mut ExifDecodeResult,
) {
    let mut list = TagListBuilder::new();
    list.push(0x001A, util::u16_value(rec, 26, LE)); // Reading1Units
    list.push(0x001C, util::u16_value(rec, 28, LE)); // Reading1Origin
    list.push(0x0020, util::ascii_text(store.arena_mut(), rec, 32, 16)); // Reading1Description
    if let Some(v) = reader::read_f64(rec, 96, LE) {
        list.push(0x0060, MetaValue::f64(v)); // Reading1Value
    }
    list.push(0x007E, util::u16_value(rec, 126, LE)); // Reading2Units
    list.push(0x0080, util::u16_value(rec, 128, LE)); // Reading2Origin
    list.push(0x0084, util::ascii_text(store.arena_mut(), rec, 132, 16)); // Reading2Description
    if let Some(v) = reader::read_f64(rec, 196, LE) {
        list.push(0x00C4, MetaValue::f64(v)); // Reading2Value
    }
    list.emit(ifd_name, store, options, result);
}

/// CameraInfo record: temperatures, calibration floats and identity
/// strings at fixed offsets; endianness probed by the 0x0002 magic.
fn decode_camera_info(
    rec: &[u8],
    file_le: bool,
    ifd_name: &str,
    store: &mut MetaStore,
    options: &ExifDecodeOptions,
    result: &mut ExifDecodeResult,
) {
    let order = endian_by_magic(file_le, rec, 0, 0x0002);
    let mut list = TagListBuilder::new();

    for off in [
        0x20u64, 0x24, 0x28, 0x2C, 0x30, 0x34, 0x3C, 0x58, 0x5C, 0x60, 0x70, 0x74, 0x78, 0x7C,
        0x80, 0x90, 0x94, 0x98, 0x9C, 0xA0, 0xA4, 0xA8, 0xAC,
    ] {
        // Emissivity, distance, ambient/atmospheric temperatures and the
        // Planck calibration constants.
        list.push(off as u16, util::f32_value(rec, off, order));
    }

    list.push(0x00D4, util::ascii_text(store.arena_mut(), rec, 0xD4, 32)); // CameraModel
    list.push(0x00F4, util::ascii_text(store.arena_mut(), rec, 0xF4, 16)); // CameraPartNumber
    list.push(0x0104, util::ascii_text(store.arena_mut(), rec, 0x104, 16)); // CameraSerialNumber
    list.push(0x0114, util::ascii_text(store.arena_mut(), rec, 0x114, 16)); // CameraSoftware
    list.push(0x0170, util::ascii_text(store.arena_mut(), rec, 0x170, 32)); // LensModel
    list.push(0x0190, util::ascii_text(store.arena_mut(), rec, 0x190, 16)); // LensPartNumber
    list.push(0x01A0, util::ascii_text(store.arena_mut(), rec, 0x1A0, 16)); // LensSerialNumber
    list.push(0x01B4, util::f32_value(rec, 0x1B4, order)); // FieldOfView
    list.push(0x01EC, util::ascii_text(store.arena_mut(), rec, 0x1EC, 16)); // FilterModel
    list.push(0x01FC, util::ascii_text(store.arena_mut(), rec, 0x1FC, 32)); // FilterPartNumber
    list.push(0x021C, util::ascii_text(store.arena_mut(), rec, 0x21C, 32)); // FilterSerialNumber

    if let Some(v) = reader::read_i32(rec, 0x308, order) {
        list.push(0x0308, MetaValue::i32(v)); // PlanckO
    }
    list.push(0x030C, util::f32_value(rec, 0x30C, order)); // PlanckR2
    list.push(0x0310, util::u16_value(rec, 0x310, order)); // RawValueRangeMin
    list.push(0x0312, util::u16_value(rec, 0x312, order)); // RawValueRangeMax
    list.push(0x0338, util::u16_value(rec, 0x338, order)); // RawValueMedian
    list.push(0x033C, util::u16_value(rec, 0x33C, order)); // RawValueRange
    list.push(0x0384, util::bytes_value(store.arena_mut(), rec, 0x384, 10)); // DateTimeOriginal
    list.push(0x0390, util::u16_value(rec, 0x390, order)); // FocusStepCount
    list.push(0x045C, util::f32_value(rec, 0x45C, order)); // FocusDistance
    list.push(0x0464, util::u16_value(rec, 0x464, order)); // FrameRate

    list.emit(ifd_name, store, options, result);
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Minimal FFF container with one PiP record.
    fn fff_with_pip() -> Vec<u8> {
        let mut fff = vec![0u8; 0x40];
        fff[..4].copy_from_slice(b"FFF\0");
        fff[4..4 + 4].copy_from_slice(b"ATAU");
        fff[0x14..0x18].copy_from_slice(&101u32.to_le_bytes()); // version (LE)
        fff[0x18..0x1C].copy_from_slice(&0x40u32.to_le_bytes()); // dir offset
        fff[0x1C..0x20].copy_from_slice(&1u32.to_le_bytes()); // dir count
        // Directory entry (0x20 bytes) at 0x40.
        let mut entry = vec![0u8; 0x20];
        entry[..2].copy_from_slice(&REC_PIP.to_le_bytes());
        entry[0x0C..0x10].copy_from_slice(&0x60u32.to_le_bytes()); // record offset
        entry[0x10..0x14].copy_from_slice(&16u32.to_le_bytes()); // record length
        fff.extend_from_slice(&entry);
        // PiP record at 0x60.
        let mut rec = vec![0u8; 16];
        rec[..4].copy_from_slice(&1.5f32.to_le_bytes());
        rec[4..6].copy_from_slice(&(-3i16).to_le_bytes());
        fff.extend_from_slice(&rec);
        fff
    }

    #[test]
    fn fff_container_pip_record() {
        let fff = fff_with_pip();
        let ctx = NoteContext {
            cfg: TiffConfig::classic(LE),
            tiff: &fff,
            note_off: 0,
            note_len: fff.len() as u64,
            make: "FLIR Systems AB".to_string(),
            model: "FLIR E60".to_string(),
        };
        let options = ExifDecodeOptions::default();
        let mk = MkTokens::new(&options, "flir");
        let mut store = MetaStore::new();
        let mut result = ExifDecodeResult::default();
        assert!(decode(&ctx, &mk, &mut store, &options, &mut result));

        let pip: Vec<_> = store
            .entries()
            .iter()
            .filter(|e| store.block_token(e.origin.block) == "mk_flir_fff_pip_0")
            .collect();
        assert_eq!(pip.len(), 7);
        assert_eq!(pip[0].value.as_f64(), Some(1.5));
        assert_eq!(pip[1].value.as_i64(), Some(-3));

        // Creator string was captured from the header.
        let header: Vec<_> = store
            .entries()
            .iter()
            .filter(|e| store.block_token(e.origin.block) == "mk_flir_fff_header_0")
            .collect();
        assert_eq!(store.arena().span(header[0].value.span().unwrap()), b"ATAU");
    }

    #[test]
    fn version_word_picks_endianness() {
        let mut fff = fff_with_pip();
        // Rewrite as big-endian container.
        fff[0x14..0x18].copy_from_slice(&101u32.to_be_bytes());
        fff[0x18..0x1C].copy_from_slice(&0x40u32.to_be_bytes());
        fff[0x1C..0x20].copy_from_slice(&1u32.to_be_bytes());
        fff[0x40..0x42].copy_from_slice(&REC_PIP.to_be_bytes());
        fff[0x4C..0x50].copy_from_slice(&0x60u32.to_be_bytes());
        fff[0x50..0x54].copy_from_slice(&16u32.to_be_bytes());

        let ctx = NoteContext {
            cfg: TiffConfig::classic(LE),
            tiff: &fff,
            note_off: 0,
            note_len: fff.len() as u64,
            make: "FLIR".to_string(),
            model: String::new(),
        };
        let options = ExifDecodeOptions::default();
        let mk = MkTokens::new(&options, "flir");
        let mut store = MetaStore::new();
        let mut result = ExifDecodeResult::default();
        assert!(decode(&ctx, &mk, &mut store, &options, &mut result));
        assert!(store
            .entries()
            .iter()
            .any(|e| store.block_token(e.origin.block) == "mk_flir_fff_pip_0"));
    }
}
