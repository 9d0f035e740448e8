//! Nikon MakerNote decoder.
//!
//! Three wire shapes: `"Nikon\0"` type-1 header (IFD at +8, outer
//! offsets), `"Nikon\0"` type-3 header (an embedded TIFF stream at +10
//! that all offsets are relative to), and headerless notes whose IFD sits
//! at offset 0 with outer offsets.
//!
//! ColorBalance and LensData subdirectories are encrypted with a keyed
//! stream cipher: the camera serial number (tag 0x001D, ASCII decimal) and
//! shutter count (tag 0x00A7) seed two substitution tables. Without both
//! keys only the plaintext version prefix is emitted.

use openmeta_core::{
    parse_tiff_header, BlockId, BlockInfo, ByteOrder, DecodeStatus, Entry, EntryFlags,
    EntryOrigin, MetaKey, MetaStore, MetaValue, TiffConfig, WireType,
};

use super::util::{self, TagListBuilder};
use super::{MkTokens, NoteContext};
use crate::exif::classic::{self, make_fixed_ascii_text, OffsetPolicy};
use crate::exif::{ExifContext, ExifDecodeOptions, ExifDecodeResult};

const XLAT0: [u8; 256] = [
    0xC1, 0xBF, 0x6D, 0x0D, 0x59, 0xC5, 0x13, 0x9D, 0x83, 0x61, 0x6B, 0x4F,
    0xC7, 0x7F, 0x3D, 0x3D, 0x53, 0x59, 0xE3, 0xC7, 0xE9, 0x2F, 0x95, 0xA7,
    0x95, 0x1F, 0xDF, 0x7F, 0x2B, 0x29, 0xC7, 0x0D, 0xDF, 0x07, 0xEF, 0x71,
    0x89, 0x3D, 0x13, 0x3D, 0x3B, 0x13, 0xFB, 0x0D, 0x89, 0xC1, 0x65, 0x1F,
    0xB3, 0x0D, 0x6B, 0x29, 0xE3, 0xFB, 0xEF, 0xA3, 0x6B, 0x47, 0x7F, 0x95,
    0x35, 0xA7, 0x47, 0x4F, 0xC7, 0xF1, 0x59, 0x95, 0x35, 0x11, 0x29, 0x61,
    0xF1, 0x3D, 0xB3, 0x2B, 0x0D, 0x43, 0x89, 0xC1, 0x9D, 0x9D, 0x89, 0x65,
    0xF1, 0xE9, 0xDF, 0xBF, 0x3D, 0x7F, 0x53, 0x97, 0xE5, 0xE9, 0x95, 0x17,
    0x1D, 0x3D, 0x8B, 0xFB, 0xC7, 0xE3, 0x67, 0xA7, 0x07, 0xF1, 0x71, 0xA7,
    0x53, 0xB5, 0x29, 0x89, 0xE5, 0x2B, 0xA7, 0x17, 0x29, 0xE9, 0x4F, 0xC5,
    0x65, 0x6D, 0x6B, 0xEF, 0x0D, 0x89, 0x49, 0x2F, 0xB3, 0x43, 0x53, 0x65,
    0x1D, 0x49, 0xA3, 0x13, 0x89, 0x59, 0xEF, 0x6B, 0xEF, 0x65, 0x1D, 0x0B,
    0x59, 0x13, 0xE3, 0x4F, 0x9D, 0xB3, 0x29, 0x43, 0x2B, 0x07, 0x1D, 0x95,
    0x59, 0x59, 0x47, 0xFB, 0xE5, 0xE9, 0x61, 0x47, 0x2F, 0x35, 0x7F, 0x17,
    0x7F, 0xEF, 0x7F, 0x95, 0x95, 0x71, 0xD3, 0xA3, 0x0B, 0x71, 0xA3, 0xAD,
    0x0B, 0x3B, 0xB5, 0xFB, 0xA3, 0xBF, 0x4F, 0x83, 0x1D, 0xAD, 0xE9, 0x2F,
    0x71, 0x65, 0xA3, 0xE5, 0x07, 0x35, 0x3D, 0x0D, 0xB5, 0xE9, 0xE5, 0x47,
    0x3B, 0x9D, 0xEF, 0x35, 0xA3, 0xBF, 0xB3, 0xDF, 0x53, 0xD3, 0x97, 0x53,
    0x49, 0x71, 0x07, 0x35, 0x61, 0x71, 0x2F, 0x43, 0x2F, 0x11, 0xDF, 0x17,
    0x97, 0xFB, 0x95, 0x3B, 0x7F, 0x6B, 0xD3, 0x25, 0xBF, 0xAD, 0xC7, 0xC5,
    0xC5, 0xB5, 0x8B, 0xEF, 0x2F, 0xD3, 0x07, 0x6B, 0x25, 0x49, 0x95, 0x25,
    0x49, 0x6D, 0x71, 0xC7
];

const XLAT1: [u8; 256] = [
    0xA7, 0xBC, 0xC9, 0xAD, 0x91, 0xDF, 0x85, 0xE5, 0xD4, 0x78, 0xD5, 0x17,
    0x46, 0x7C, 0x29, 0x4C, 0x4D, 0x03, 0xE9, 0x25, 0x68, 0x11, 0x86, 0xB3,
    0xBD, 0xF7, 0x6F, 0x61, 0x22, 0xA2, 0x26, 0x34, 0x2A, 0xBE, 0x1E, 0x46,
    0x14, 0x68, 0x9D, 0x44, 0x18, 0xC2, 0x40, 0xF4, 0x7E, 0x5F, 0x1B, 0xAD,
    0x0B, 0x94, 0xB6, 0x67, 0xB4, 0x0B, 0xE1, 0xEA, 0x95, 0x9C, 0x66, 0xDC,
    0xE7, 0x5D, 0x6C, 0x05, 0xDA, 0xD5, 0xDF, 0x7A, 0xEF, 0xF6, 0xDB, 0x1F,
    0x82, 0x4C, 0xC0, 0x68, 0x47, 0xA1, 0xBD, 0xEE, 0x39, 0x50, 0x56, 0x4A,
    0xDD, 0xDF, 0xA5, 0xF8, 0xC6, 0xDA, 0xCA, 0x90, 0xCA, 0x01, 0x42, 0x9D,
    0x8B, 0x0C, 0x73, 0x43, 0x75, 0x05, 0x94, 0xDE, 0x24, 0xB3, 0x80, 0x34,
    0xE5, 0x2C, 0xDC, 0x9B, 0x3F, 0xCA, 0x33, 0x45, 0xD0, 0xDB, 0x5F, 0xF5,
    0x52, 0xC3, 0x21, 0xDA, 0xE2, 0x22, 0x72, 0x6B, 0x3E, 0xD0, 0x5B, 0xA8,
    0x87, 0x8C, 0x06, 0x5D, 0x0F, 0xDD, 0x09, 0x19, 0x93, 0xD0, 0xB9, 0xFC,
    0x8B, 0x0F, 0x84, 0x60, 0x33, 0x1C, 0x9B, 0x45, 0xF1, 0xF0, 0xA3, 0x94,
    0x3A, 0x12, 0x77, 0x33, 0x4D, 0x44, 0x78, 0x28, 0x3C, 0x9E, 0xFD, 0x65,
    0x57, 0x16, 0x94, 0x6B, 0xFB, 0x59, 0xD0, 0xC8, 0x22, 0x36, 0xDB, 0xD2,
    0x63, 0x98, 0x43, 0xA1, 0x04, 0x87, 0x86, 0xF7, 0xA6, 0x26, 0xBB, 0xD6,
    0x59, 0x4D, 0xBF, 0x6A, 0x2E, 0xAA, 0x2B, 0xEF, 0xE6, 0x78, 0xB6, 0x4E,
    0xE0, 0x2F, 0xDC, 0x7C, 0xBE, 0x57, 0x19, 0x32, 0x7E, 0x2A, 0xD0, 0xB8,
    0xBA, 0x29, 0x00, 0x3C, 0x52, 0x7D, 0xA8, 0x49, 0x3B, 0x2D, 0xEB, 0x25,
    0x49, 0xFA, 0xA3, 0xAA, 0x39, 0xA7, 0xC5, 0xA7, 0x50, 0x11, 0x36, 0xFB,
    0xC6, 0x67, 0x4A, 0xF5, 0xA5, 0x12, 0x65, 0x7E, 0xB0, 0xDF, 0xAF, 0x4E,
    0xB3, 0x61, 0x7F, 0x2F
];

const TAG_SERIAL_NUMBER: u16 = 0x001D;
const TAG_SHUTTER_COUNT: u16 = 0x00A7;

pub(crate) fn detect(ctx: &NoteContext<'_>) -> bool {
    ctx.note_starts(b"Nikon\0") || ctx.make_has("NIKON")
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

    let le = if ctx.note_starts(b"Nikon\0") {
        match note.get(6).copied() {
            // Type 3: a self-contained TIFF stream at +10; entry offsets are
            // relative to that stream.
            Some(2) => {
                let tiff = &note[10..];
                let Ok(header) = parse_tiff_header(tiff) else {
                    result.update(DecodeStatus::Malformed);
                    return true;
                };
                if header.cfg.bigtiff {
                    return false;
                }
                let outcome = classic::decode_ifd_no_header(
                    header.cfg,
                    tiff,
                    header.first_ifd,
                    &mk.ifd0,
                    BlockId::INVALID,
                    OffsetPolicy::absolute(),
                    EntryFlags::NONE,
                    store,
                    options,
                    result,
                    |_, _| {},
                );
                if outcome.is_none() {
                    return true;
                }
                header.cfg.byte_order == ByteOrder::LittleEndian
            }
            // Type 1: IFD at +8, offsets into the outer stream.
            _ => {
                let mut cfg = ctx.cfg;
                cfg.bigtiff = false;
                let ifd_off = ctx.note_off + 8;
                if !classic::looks_like_classic_ifd(cfg, ctx.tiff, ifd_off, &options.limits) {
                    return false;
                }
                classic::decode_ifd_no_header(
                    cfg,
                    ctx.tiff,
                    ifd_off,
                    &mk.ifd0,
                    BlockId::INVALID,
                    OffsetPolicy::absolute(),
                    EntryFlags::NONE,
                    store,
                    options,
                    result,
                    |_, _| {},
                );
                cfg.byte_order == ByteOrder::LittleEndian
            }
        }
    } else {
        // Headerless: IFD at the note start, offsets into the outer stream.
        let mut cfg = ctx.cfg;
        cfg.bigtiff = false;
        if !classic::looks_like_classic_ifd(cfg, ctx.tiff, ctx.note_off, &options.limits) {
            return false;
        }
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
        cfg.byte_order == ByteOrder::LittleEndian
    };

    decode_binary_subdirs(mk, store, le, options, result);
    true
}

/// Stream-cipher decrypt keyed by serial number and shutter count.
fn decrypt(enc: &[u8], serial_key: u32, shutter_count: u32) -> Vec<u8> {
    let serial8 = (serial_key & 0xFF) as u8;
    let key = ((shutter_count)
        ^ (shutter_count >> 8)
        ^ (shutter_count >> 16)
        ^ (shutter_count >> 24)) as u8;

    let ci0 = XLAT0[usize::from(serial8)];
    let mut cj = XLAT1[usize::from(key)];
    let mut ck = 0x60u8;

    let mut out = Vec::with_capacity(enc.len());
    for &b in enc {
        cj = cj.wrapping_add(ci0.wrapping_mul(ck));
        ck = ck.wrapping_add(1);
        out.push(b ^ cj);
    }
    out
}

/// Serial-number text parsed as decimal, spaces tolerated.
fn parse_serial_key(s: &str) -> Option<u32> {
    let trimmed = s.trim_start_matches(' ');
    if trimmed.is_empty() {
        return None;
    }
    let mut v: u64 = 0;
    for c in trimmed.bytes() {
        if !c.is_ascii_digit() {
            return None;
        }
        v = v * 10 + u64::from(c - b'0');
        if v > u64::from(u32::MAX) {
            return None;
        }
    }
    Some(v as u32)
}

fn i8_value(b: u8) -> MetaValue {
    MetaValue::scalar_u64(openmeta_core::ElemType::I8, b as i8 as i64 as u64)
}

/// Post-pass over the known binary subdirectory tags.
fn decode_binary_subdirs(
    mk: &MkTokens,
    store: &mut MetaStore,
    le: bool,
    options: &ExifDecodeOptions,
    result: &mut ExifDecodeResult,
) {
    let order = if le { ByteOrder::LittleEndian } else { ByteOrder::BigEndian };

    // Cipher keys from the plaintext main-IFD entries.
    let mut lookup = ExifContext::new();
    let serial_key = lookup
        .find_first_text(store, &mk.ifd0, TAG_SERIAL_NUMBER)
        .and_then(|s| parse_serial_key(&s));
    let shutter_count = lookup.find_first_u32(store, &mk.ifd0, TAG_SHUTTER_COUNT);

    const SUBDIR_TAGS: [u16; 18] = [
        0x001F, 0x0023, 0x00BD, 0x0024, 0x0025, 0x002B, 0x002C, 0x0032, 0x004E, 0x0091, 0x0097,
        0x0098, 0x00A8, 0x00B0, 0x00B7, 0x00B8, 0x00B9, 0x00BB,
    ];
    for tag in SUBDIR_TAGS {
        let Some(raw) = util::entry_bytes_copy(store, &mk.ifd0, tag) else {
            continue;
        };
        match tag {
            0x001F => decode_vrinfo(&raw, mk, store, options, result),
            0x0023 | 0x00BD => decode_picture_control(&raw, mk, store, options, result),
            0x0024 => decode_world_time(&raw, order, mk, store, options, result),
            0x0025 => decode_isoinfo(&raw, order, mk, store, options, result),
            0x002B => decode_version_u8(&raw, "distortinfo", mk, store, options, result),
            0x002C => decode_version_only(&raw, "unknowninfo", mk, store, options, result),
            0x0032 => decode_version_only(&raw, "unknowninfo2", mk, store, options, result),
            0x004E => decode_settings_dir(&raw, mk, store, options, result),
            0x0091 => decode_shotinfo(&raw, mk, store, options, result),
            0x0097 => decode_color_balance(&raw, order, serial_key, shutter_count, mk, store, options, result),
            0x0098 => decode_lens_data(&raw, serial_key, shutter_count, mk, store, options, result),
            0x00A8 => decode_flash_info(&raw, mk, store, options, result),
            0x00B0 => decode_multi_exposure(&raw, order, mk, store, options, result),
            0x00B7 => decode_afinfo2(&raw, order, mk, store, options, result),
            0x00B8 => decode_file_info(&raw, order, mk, store, options, result),
            0x00B9 => decode_aftune(&raw, mk, store, options, result),
            0x00BB => decode_retouch_info(&raw, mk, store, options, result),
            _ => {}
        }
    }
}

fn decode_vrinfo(
    raw: &[u8],
    mk: &MkTokens,
    store: &mut MetaStore,
    options: &ExifDecodeOptions,
    result: &mut ExifDecodeResult,
) {
    if raw.len() < 7 {
        return;
    }
    let mut list = TagListBuilder::new();
    list.push(0x0000, make_fixed_ascii_text(store.arena_mut(), &raw[..4])); // VRInfoVersion
    list.push(0x0004, MetaValue::u8(raw[4])); // VibrationReduction
    list.push(0x0006, MetaValue::u8(raw[6])); // VRMode
    list.emit(&mk.subtable("vrinfo", 0), store, options, result);
}

fn decode_picture_control(
    raw: &[u8],
    mk: &MkTokens,
    store: &mut MetaStore,
    options: &ExifDecodeOptions,
    result: &mut ExifDecodeResult,
) {
    if raw.len() < 52 {
        return;
    }
    let mut list = TagListBuilder::new();
    list.push(0x0000, make_fixed_ascii_text(store.arena_mut(), &raw[..4])); // version
    list.push(0x0004, make_fixed_ascii_text(store.arena_mut(), &raw[4..24])); // name
    list.push(0x0018, make_fixed_ascii_text(store.arena_mut(), &raw[24..44])); // base
    list.push(0x0030, MetaValue::u8(raw[48])); // PictureControlAdjust
    list.push(0x0031, MetaValue::u8(raw[49])); // PictureControlQuickAdjust
    // Sharpness through hue at fixed byte offsets.
    for tag in 0x0032u16..=0x0039 {
        if usize::from(tag) >= raw.len() {
            break;
        }
        list.push(tag, MetaValue::u8(raw[usize::from(tag)]));
    }
    list.emit(&mk.subtable("picturecontrol", 0), store, options, result);
}

fn decode_world_time(
    raw: &[u8],
    order: ByteOrder,
    mk: &MkTokens,
    store: &mut MetaStore,
    options: &ExifDecodeOptions,
    result: &mut ExifDecodeResult,
) {
    if raw.len() < 4 {
        return;
    }
    let mut list = TagListBuilder::new();
    list.push(0x0000, util::i16_value(raw, 0, order)); // Timezone
    list.push(0x0002, MetaValue::u8(raw[2])); // DaylightSavings
    list.push(0x0003, MetaValue::u8(raw[3])); // DateDisplayFormat
    list.emit(&mk.subtable("worldtime", 0), store, options, result);
}

fn decode_isoinfo(
    raw: &[u8],
    order: ByteOrder,
    mk: &MkTokens,
    store: &mut MetaStore,
    options: &ExifDecodeOptions,
    result: &mut ExifDecodeResult,
) {
    if raw.len() < 12 {
        return;
    }
    let mut list = TagListBuilder::new();
    list.push(0x0000, MetaValue::u8(raw[0])); // ISO
    list.push(0x0004, util::u16_value(raw, 4, order)); // ISOExpansion
    list.push(0x0006, MetaValue::u8(raw[6])); // ISO2
    list.push(0x000A, util::u16_value(raw, 10, order)); // ISOExpansion2
    list.emit(&mk.subtable("isoinfo", 0), store, options, result);
}

/// Version string plus one u8 field right after it.
fn decode_version_u8(
    raw: &[u8],
    subtable: &str,
    mk: &MkTokens,
    store: &mut MetaStore,
    options: &ExifDecodeOptions,
    result: &mut ExifDecodeResult,
) {
    if raw.len() < 5 {
        return;
    }
    let mut list = TagListBuilder::new();
    list.push(0x0000, make_fixed_ascii_text(store.arena_mut(), &raw[..4]));
    list.push(0x0004, MetaValue::u8(raw[4]));
    list.emit(&mk.subtable(subtable, 0), store, options, result);
}

/// Version string only.
fn decode_version_only(
    raw: &[u8],
    subtable: &str,
    mk: &MkTokens,
    store: &mut MetaStore,
    options: &ExifDecodeOptions,
    result: &mut ExifDecodeResult,
) {
    if raw.len() < 4 {
        return;
    }
    let mut list = TagListBuilder::new();
    list.push(0x0000, make_fixed_ascii_text(store.arena_mut(), &raw[..4]));
    list.emit(&mk.subtable(subtable, 0), store, options, result);
}

fn decode_shotinfo(
    raw: &[u8],
    mk: &MkTokens,
    store: &mut MetaStore,
    options: &ExifDecodeOptions,
    result: &mut ExifDecodeResult,
) {
    if raw.len() < 9 {
        return;
    }
    let mut list = TagListBuilder::new();
    list.push(0x0000, make_fixed_ascii_text(store.arena_mut(), &raw[..4])); // ShotInfoVersion
    list.push(0x0004, make_fixed_ascii_text(store.arena_mut(), &raw[4..9])); // FirmwareVersion
    list.emit(&mk.subtable("shotinfo", 0), store, options, result);
}

/// ColorBalance: version picks the layout; 0102/0205/0213/0219 decrypt as
/// ColorBalance2, 0209/0211/0215/0217 as ColorBalance4. Without both keys
/// only the version prefix is emitted.
#[allow(clippy::too_many_arguments)]
fn decode_color_balance(
    raw: &[u8],
    order: ByteOrder,
    serial_key: Option<u32>,
    shutter_count: Option<u32>,
    mk: &MkTokens,
    store: &mut MetaStore,
    options: &ExifDecodeOptions,
    result: &mut ExifDecodeResult,
) {
    if raw.len() < 4 {
        return;
    }
    let ver = &raw[..4];
    let keys = serial_key.zip(shutter_count);

    let subtable = match ver {
        b"0102" | b"0205" | b"0213" | b"0219" => Some("colorbalance2"),
        b"0209" | b"0211" | b"0215" | b"0217" => Some("colorbalance4"),
        _ => None,
    };
    if let (Some(subtable), Some((serial, shutter))) = (subtable, keys) {
        if raw.len() >= 12 {
            let dec = decrypt(&raw[4..12], serial, shutter);
            let mut levels = [0u16; 4];
            for (k, level) in levels.iter_mut().enumerate() {
                *level = openmeta_core::reader::read_u16(&dec, k as u64 * 2, order).unwrap_or(0);
            }
            let value = util::u16_slice_value(store.arena_mut(), &levels);
            let mut list = TagListBuilder::new();
            list.push(0x0000, value); // WB_RGGBLevels
            list.emit(&mk.subtable(subtable, 0), store, options, result);
            return;
        }
    }

    // Keys missing or unknown version: plaintext version prefix only.
    let mut list = TagListBuilder::new();
    list.push(0x0000, make_fixed_ascii_text(store.arena_mut(), ver));
    list.emit(&mk.subtable("colorbalanceunknown2", 0), store, options, result);
}

/// LensData: version picks the layout; 0204 is encrypted, 04xx layouts
/// carry a plaintext lens model string at a fixed offset.
fn decode_lens_data(
    raw: &[u8],
    serial_key: Option<u32>,
    shutter_count: Option<u32>,
    mk: &MkTokens,
    store: &mut MetaStore,
    options: &ExifDecodeOptions,
    result: &mut ExifDecodeResult,
) {
    if raw.len() < 4 {
        return;
    }
    let ver = &raw[..4];
    let (subtable, model_tag): (&str, Option<(u16, usize)>) = match ver {
        b"0204" => ("lensdata0204", None),
        b"0400" => ("lensdata0400", Some((0x018A, 0x018A))),
        b"0402" => ("lensdata0402", Some((0x018B, 0x018B))),
        b"0403" => ("lensdata0403", Some((0x02AC, 0x02AC))),
        _ => ("lensdataunknown", None),
    };
    let name = mk.subtable(subtable, 0);

    if subtable == "lensdata0204" && raw.len() >= 20 {
        if let Some((serial, shutter)) = serial_key.zip(shutter_count) {
            let dec = decrypt(&raw[4..20], serial, shutter);
            let mut list = TagListBuilder::new();
            list.push(0x0000, make_fixed_ascii_text(store.arena_mut(), ver));
            // ExitPupilPosition through MCUVersion, byte fields at 4..20.
            for tag in [
                0x0004u16, 0x0005, 0x0008, 0x000A, 0x000B, 0x000C, 0x000D, 0x000E, 0x000F,
                0x0010, 0x0011, 0x0012, 0x0013,
            ] {
                let idx = usize::from(tag) - 4;
                if idx < dec.len() {
                    list.push(tag, MetaValue::u8(dec[idx]));
                }
            }
            list.emit(&name, store, options, result);
            return;
        }
    }

    let mut list = TagListBuilder::new();
    list.push(0x0000, make_fixed_ascii_text(store.arena_mut(), ver));
    if let Some((tag, off)) = model_tag {
        if off + 64 <= raw.len() {
            list.push(tag, make_fixed_ascii_text(store.arena_mut(), &raw[off..off + 64]));
        }
    }
    list.emit(&name, store, options, result);
}

/// NikonSettings (tag 0x004E): little-endian record table of
/// `(tag, type, value)` 8-byte rows after a 24-byte header.
fn decode_settings_dir(
    raw: &[u8],
    mk: &MkTokens,
    store: &mut MetaStore,
    options: &ExifDecodeOptions,
    result: &mut ExifDecodeResult,
) {
    const LE: ByteOrder = ByteOrder::LittleEndian;
    if raw.len() < 24 || raw.len() % 8 != 0 {
        return;
    }
    let Some(rec_count) = openmeta_core::reader::read_u32(raw, 20, LE) else {
        return;
    };
    if rec_count == 0 {
        return;
    }
    if rec_count > options.limits.max_entries_per_ifd {
        result.update(DecodeStatus::LimitExceeded);
        return;
    }
    let rec_bytes = u64::from(rec_count) * 8;
    if 24 + rec_bytes != raw.len() as u64 {
        return;
    }

    let ifd_name = mk
        .prefix
        .replace("mk_nikon", "mk_nikonsettings");
    let ifd_name = classic::make_mk_subtable_ifd_token(&ifd_name, "main", 0);
    let Some(token) = store.arena_mut().intern(ifd_name.as_bytes()) else {
        return;
    };
    let block = store.add_block(BlockInfo {
        token,
        parent: BlockId::INVALID,
        wire_offset: 0,
        derived: true,
    });
    if !block.is_valid() {
        return;
    }

    for i in 0..u64::from(rec_count) {
        if !result.entry_budget_left(&options.limits) {
            result.update(DecodeStatus::LimitExceeded);
            return;
        }
        let off = 24 + i * 8;
        let (Some(tag), Some(type_be), Some(val32)) = (
            openmeta_core::reader::read_u16(raw, off, LE),
            openmeta_core::reader::read_u16(raw, off + 2, ByteOrder::BigEndian),
            openmeta_core::reader::read_u32(raw, off + 4, LE),
        ) else {
            result.update(DecodeStatus::Malformed);
            return;
        };
        let value = match type_be {
            1 => MetaValue::u8(val32 as u8),
            3 => MetaValue::u16(val32 as u16),
            8 => MetaValue::i16(val32 as u16 as i16),
            9 => MetaValue::i32(val32 as i32),
            _ => MetaValue::u32(val32),
        };
        store.add_entry(Entry {
            key: MetaKey::ExifTag { ifd: token, tag },
            value,
            origin: EntryOrigin {
                block,
                order_in_block: i as u32,
                wire: WireType::tiff(type_be),
                wire_count: 1,
            },
            flags: EntryFlags::DERIVED,
        });
        result.entries_emitted += 1;
    }
}

/// FlashInfo: layout picked by the version string; i8 fields use Nikon's
/// offset encoding.
fn decode_flash_info(
    raw: &[u8],
    mk: &MkTokens,
    store: &mut MetaStore,
    options: &ExifDecodeOptions,
    result: &mut ExifDecodeResult,
) {
    if raw.len() < 4 {
        return;
    }
    let ver = &raw[..4];
    let subtable = match ver {
        b"0100" => "flashinfo0100",
        b"0102" => "flashinfo0102",
        // Version 0105 reports itself differently but uses the 0103 layout.
        b"0103" | b"0105" => "flashinfo0103",
        b"0106" => "flashinfo0106",
        b"0107" => "flashinfo0107",
        _ => "flashinfo0100",
    };
    let mut list = TagListBuilder::new();
    list.push(0x0000, make_fixed_ascii_text(store.arena_mut(), ver));
    if raw.len() > 4 {
        list.push(0x0004, MetaValue::u8(raw[4])); // FlashSource
    }
    if raw.len() >= 8 {
        list.push(0x0006, util::u8_array_from(store.arena_mut(), &[raw[6], raw[7]])); // ExternalFlashFirmware
    }
    if raw.len() > 8 {
        list.push(0x0008, MetaValue::u8(raw[8])); // ExternalFlashFlags
    }
    for tag in [0x000Cu16, 0x000D, 0x000E, 0x000F, 0x0010] {
        if usize::from(tag) < raw.len() {
            list.push(tag, MetaValue::u8(raw[usize::from(tag)]));
        }
    }
    for tag in [
        0x000Au16, 0x0013, 0x0014, 0x0015, 0x001B, 0x001D, 0x0027, 0x0028, 0x0029, 0x002A,
    ] {
        if usize::from(tag) < raw.len() {
            list.push(tag, i8_value(raw[usize::from(tag)]));
        }
    }
    list.emit(&mk.subtable(subtable, 0), store, options, result);
}

fn decode_multi_exposure(
    raw: &[u8],
    order: ByteOrder,
    mk: &MkTokens,
    store: &mut MetaStore,
    options: &ExifDecodeOptions,
    result: &mut ExifDecodeResult,
) {
    if raw.len() < 16 {
        return;
    }
    let mut list = TagListBuilder::new();
    list.push(0x0000, make_fixed_ascii_text(store.arena_mut(), &raw[..4]));
    list.push(0x0001, util::u32_value(raw, 4, order)); // MultiExposureMode
    list.push(0x0002, util::u32_value(raw, 8, order)); // MultiExposureShots
    list.push(0x0003, util::u32_value(raw, 12, order)); // MultiExposureAutoGain
    list.emit(&mk.subtable("multiexposure", 0), store, options, result);
}

fn decode_afinfo2(
    raw: &[u8],
    order: ByteOrder,
    mk: &MkTokens,
    store: &mut MetaStore,
    options: &ExifDecodeOptions,
    result: &mut ExifDecodeResult,
) {
    if raw.len() < 9 {
        return;
    }
    let ver = &raw[..4];
    let subtable = match ver {
        b"0101" => "afinfo2v0101",
        b"0200" => "afinfo2v0200",
        b"0300" => "afinfo2v0300",
        b"0400" => "afinfo2v0400",
        _ => "afinfo2v0100",
    };
    let mut list = TagListBuilder::new();
    list.push(0x0000, make_fixed_ascii_text(store.arena_mut(), ver));
    for tag in 0x0004u16..=0x0007 {
        // ContrastDetectAF, AFAreaMode, PhaseDetectAF, PrimaryAFPoint.
        if usize::from(tag) < raw.len() {
            list.push(tag, MetaValue::u8(raw[usize::from(tag)]));
        }
    }
    if raw.len() >= 0x0008 + 5 {
        list.push(0x0008, util::bytes_value(store.arena_mut(), raw, 0x0008, 5)); // AFPointsUsed
    }
    for tag in [0x0010u16, 0x0012, 0x0014, 0x0016, 0x0018, 0x001A] {
        list.push(tag, util::u16_value(raw, u64::from(tag), order));
    }
    if raw.len() > 0x001C {
        list.push(0x001C, MetaValue::u8(raw[0x001C]));
    }
    list.emit(&mk.subtable(subtable, 0), store, options, result);
}

fn decode_file_info(
    raw: &[u8],
    order: ByteOrder,
    mk: &MkTokens,
    store: &mut MetaStore,
    options: &ExifDecodeOptions,
    result: &mut ExifDecodeResult,
) {
    if raw.len() < 10 {
        return;
    }
    let mut list = TagListBuilder::new();
    list.push(0x0000, make_fixed_ascii_text(store.arena_mut(), &raw[..4]));
    list.push(0x0002, util::u16_value(raw, 4, order)); // MemoryCardNumber
    list.push(0x0003, util::u16_value(raw, 6, order)); // DirectoryNumber
    list.push(0x0004, util::u16_value(raw, 8, order)); // FileNumber
    list.emit(&mk.subtable("fileinfo", 0), store, options, result);
}

fn decode_aftune(
    raw: &[u8],
    mk: &MkTokens,
    store: &mut MetaStore,
    options: &ExifDecodeOptions,
    result: &mut ExifDecodeResult,
) {
    if raw.len() < 4 {
        return;
    }
    let mut list = TagListBuilder::new();
    list.push(0x0000, MetaValue::u8(raw[0])); // AFFineTune
    list.push(0x0001, MetaValue::u8(raw[1])); // AFFineTuneIndex
    list.push(0x0002, i8_value(raw[2])); // AFFineTuneAdj
    list.push(0x0003, i8_value(raw[3])); // AFFineTuneAdjTele
    list.emit(&mk.subtable("aftune", 0), store, options, result);
}

fn decode_retouch_info(
    raw: &[u8],
    mk: &MkTokens,
    store: &mut MetaStore,
    options: &ExifDecodeOptions,
    result: &mut ExifDecodeResult,
) {
    if raw.len() < 6 {
        return;
    }
    let mut list = TagListBuilder::new();
    list.push(0x0000, make_fixed_ascii_text(store.arena_mut(), &raw[..4]));
    list.push(0x0005, i8_value(raw[5])); // RetouchNEFProcessing
    list.emit(&mk.subtable("retouchinfo", 0), store, options, result);
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Encrypt is its own inverse given identical key stream.
    fn encrypt(plain: &[u8], serial: u32, shutter: u32) -> Vec<u8> {
        decrypt(plain, serial, shutter)
    }

    #[test]
    fn stream_cipher_round_trips() {
        let plain = [1u8, 2, 3, 4, 250, 0, 77, 128];
        let enc = encrypt(&plain, 3001234, 5678);
        assert_ne!(enc, plain);
        assert_eq!(decrypt(&enc, 3001234, 5678), plain);
        // Different keys yield a different stream.
        assert_ne!(decrypt(&enc, 3001235, 5678), plain);
    }

    #[test]
    fn serial_parsing() {
        assert_eq!(parse_serial_key("3001234"), Some(3001234));
        assert_eq!(parse_serial_key("  42"), Some(42));
        assert_eq!(parse_serial_key("NO12345"), None);
        assert_eq!(parse_serial_key(""), None);
        assert_eq!(parse_serial_key("99999999999"), None);
    }

    /// Type-3 note: "Nikon\0" + version + embedded TIFF with serial,
    /// shutter count, and an encrypted ColorBalance blob.
    #[test]
    fn encrypted_color_balance_round_trip() {
        let serial = 6007123u32;
        let shutter = 12345u32;

        // Plain WB levels (u16 LE): 512, 256, 256, 512.
        let mut cb = b"0213".to_vec();
        let mut levels = Vec::new();
        for v in [512u16, 256, 256, 512] {
            levels.extend_from_slice(&v.to_le_bytes());
        }
        cb.extend_from_slice(&encrypt(&levels, serial, shutter));
        cb.extend_from_slice(&[0; 4]);

        // Embedded TIFF: IFD with serial (ASCII), shutter count (LONG),
        // ColorBalance (UNDEFINED out-of-line).
        let serial_text = b"6007123\0";
        let mut tiff = b"II\x2A\x00\x08\x00\x00\x00".to_vec();
        tiff.extend_from_slice(&3u16.to_le_bytes());
        // 0x001D ASCII[8] -> offset 50
        tiff.extend_from_slice(&0x001Du16.to_le_bytes());
        tiff.extend_from_slice(&2u16.to_le_bytes());
        tiff.extend_from_slice(&8u32.to_le_bytes());
        tiff.extend_from_slice(&50u32.to_le_bytes());
        // 0x00A7 LONG[1] inline
        tiff.extend_from_slice(&0x00A7u16.to_le_bytes());
        tiff.extend_from_slice(&4u16.to_le_bytes());
        tiff.extend_from_slice(&1u32.to_le_bytes());
        tiff.extend_from_slice(&shutter.to_le_bytes());
        // 0x0097 UNDEFINED[16] -> offset 58
        tiff.extend_from_slice(&0x0097u16.to_le_bytes());
        tiff.extend_from_slice(&7u16.to_le_bytes());
        tiff.extend_from_slice(&(cb.len() as u32).to_le_bytes());
        tiff.extend_from_slice(&58u32.to_le_bytes());
        tiff.extend_from_slice(&0u32.to_le_bytes());
        assert_eq!(tiff.len(), 50);
        tiff.extend_from_slice(serial_text);
        tiff.extend_from_slice(&cb);

        let mut note = b"Nikon\x00\x02\x10\x00\x00".to_vec();
        note.extend_from_slice(&tiff);

        let ctx = NoteContext {
            cfg: TiffConfig::classic(ByteOrder::BigEndian),
            tiff: &note,
            note_off: 0,
            note_len: note.len() as u64,
            make: "NIKON CORPORATION".to_string(),
            model: "NIKON D300".to_string(),
        };
        let options = ExifDecodeOptions::default();
        let mk = MkTokens::new(&options, "nikon");
        let mut store = MetaStore::new();
        let mut result = ExifDecodeResult::default();
        assert!(decode(&ctx, &mk, &mut store, &options, &mut result));

        let cb_entries: Vec<_> = store
            .entries()
            .iter()
            .filter(|e| store.block_token(e.origin.block) == "mk_nikon_colorbalance2_0")
            .collect();
        assert_eq!(cb_entries.len(), 1);
        let span = cb_entries[0].value.span().unwrap();
        let bytes = store.arena().span(span);
        assert_eq!(u16::from_le_bytes([bytes[0], bytes[1]]), 512);
        assert_eq!(u16::from_le_bytes([bytes[2], bytes[3]]), 256);
    }

    /// Without the serial key only the version prefix survives.
    #[test]
    fn missing_keys_emit_version_prefix() {
        let raw = b"0213AAAAAAAA\0\0\0\0".to_vec();
        let options = ExifDecodeOptions::default();
        let mk = MkTokens::new(&options, "nikon");
        let mut store = MetaStore::new();
        let mut result = ExifDecodeResult::default();
        decode_color_balance(
            &raw,
            ByteOrder::LittleEndian,
            None,
            None,
            &mk,
            &mut store,
            &options,
            &mut result,
        );
        let entries: Vec<_> = store.entries().iter().collect();
        assert_eq!(entries.len(), 1);
        assert_eq!(
            store.block_token(entries[0].origin.block),
            "mk_nikon_colorbalanceunknown2_0"
        );
        assert_eq!(store.arena().span(entries[0].value.span().unwrap()), b"0213");
    }
}
