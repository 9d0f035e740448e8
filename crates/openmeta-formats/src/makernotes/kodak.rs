//! Kodak MakerNote decoder.
//!
//! Kodak shipped more MakerNote layouts than any other vendor. The wire
//! shapes handled here, discriminated by header magic and Model string:
//! - `"KDK"` fixed block (~34 fields, little-endian)
//! - serial-number-only notes (bare ASCII at offset 0)
//! - Type6 (DX3215 big-endian / DX3700 little-endian fixed block)
//! - Type9 (`"IIII"` + ASCII timestamp block)
//! - Type4 (DC200/DC210/DC215: original file name)
//! - Type3 (DC240/DC280/DC3400/DC5000 fixed block, big-endian)
//! - Type5 (CX42xx/CX62xx fixed block, big-endian)
//! - Type2 (maker/model strings + dimensions, big-endian)
//! - Type8a/Type10: classic IFD with offsets into the outer TIFF
//! - a self-contained TIFF-header variant

use openmeta_core::{BlockId, ByteArena, ByteOrder, EntryFlags, MetaStore, MetaValue, TextEncoding, TiffConfig};

use super::util::{self, TagListBuilder};
use super::{MkTokens, NoteContext};
use crate::exif::classic::{self, make_fixed_ascii_text, OffsetPolicy};
use crate::exif::{ExifDecodeOptions, ExifDecodeResult};

const LE: ByteOrder = ByteOrder::LittleEndian;
const BE: ByteOrder = ByteOrder::BigEndian;

pub(crate) fn detect(ctx: &NoteContext<'_>) -> bool {
    ctx.note_starts(b"KDK") || ctx.make_has("KODAK") || ctx.make_has("EASTMAN KODAK")
}

pub(crate) fn decode(
    ctx: &NoteContext<'_>,
    mk: &MkTokens,
    store: &mut MetaStore,
    options: &ExifDecodeOptions,
    result: &mut ExifDecodeResult,
) -> bool {
    let note = ctx.note();

    if ctx.note_starts(b"KDK") {
        return decode_kdk(note, mk, store, options, result);
    }
    if decode_serial_only(note, mk, store, options, result) {
        return true;
    }

    if ctx.model_has("DX3215") {
        return decode_type6(note, BE, mk, store, options, result);
    }
    if ctx.model_has("DX3700") {
        return decode_type6(note, LE, mk, store, options, result);
    }

    if decode_type9(ctx, note, mk, store, options, result) {
        return true;
    }
    if (ctx.model_has("DC200") || ctx.model_has("DC210") || ctx.model_has("DC215"))
        && decode_type4(note, mk, store, options, result)
    {
        return true;
    }
    if (ctx.model_has("DC240")
        || ctx.model_has("DC280")
        || ctx.model_has("DC3400")
        || ctx.model_has("DC5000"))
        && decode_type3(note, mk, store, options, result)
    {
        return true;
    }
    if (ctx.model_has("CX4200")
        || ctx.model_has("CX4210")
        || ctx.model_has("CX4230")
        || ctx.model_has("CX4300")
        || ctx.model_has("CX4310")
        || ctx.model_has("CX6200")
        || ctx.model_has("CX6230"))
        && decode_type5(note, mk, store, options, result)
    {
        return true;
    }
    if decode_type2(note, mk, store, options, result) {
        return true;
    }
    if decode_type8_absolute(ctx, mk, store, options, result) {
        return true;
    }
    decode_tiff_variant(note, mk, store, options, result)
}

/// `"MM/DD"` text from two packed bytes.
fn month_day_text(arena: &mut ByteArena, month: u8, day: u8) -> MetaValue {
    let text = format!("{month:02}/{day:02}");
    match arena.intern(text.as_bytes()) {
        Some(span) => MetaValue::text(span, TextEncoding::Ascii),
        None => MetaValue::empty(),
    }
}

/// `"HH:MM:SS.ff"` text from four packed bytes.
fn time_text(arena: &mut ByteArena, hh: u8, mm: u8, ss: u8, ff: u8) -> MetaValue {
    let text = format!("{hh:02}:{mm:02}:{ss:02}.{ff:02}");
    match arena.intern(text.as_bytes()) {
        Some(span) => MetaValue::text(span, TextEncoding::Ascii),
        None => MetaValue::empty(),
    }
}

/// KDK fixed block: the classic consumer-camera layout, little-endian.
fn decode_kdk(
    note: &[u8],
    mk: &MkTokens,
    store: &mut MetaStore,
    options: &ExifDecodeOptions,
    result: &mut ExifDecodeResult,
) -> bool {
    if note.len() < 0x70 {
        return false;
    }
    let model_c0 = note[0x08];
    if !(0x20..=0x7E).contains(&model_c0) {
        return false;
    }

    let mut list = TagListBuilder::new();

    // Model string at +0x08, stopping at space/NUL/non-printable.
    let model_end = note[0x08..]
        .iter()
        .take(16)
        .position(|&c| c == 0 || c == b' ' || !(0x20..=0x7E).contains(&c))
        .unwrap_or(16.min(note.len() - 0x08));
    list.push(
        0x0000,
        make_fixed_ascii_text(store.arena_mut(), &note[0x08..0x08 + model_end]),
    );

    list.push(0x0009, util::u8_value(note, 0x11)); // Quality
    list.push(0x000A, util::u8_value(note, 0x12)); // BurstMode
    list.push(0x000C, util::u16_value(note, 0x14, LE)); // KodakImageWidth
    list.push(0x000E, util::u16_value(note, 0x16, LE)); // KodakImageHeight
    list.push(0x0010, util::u16_value(note, 0x18, LE)); // YearCreated
    let month_day = month_day_text(store.arena_mut(), note[0x1A], note[0x1B]);
    list.push(0x0012, month_day);
    let time = time_text(store.arena_mut(), note[0x1C], note[0x1D], note[0x1E], note[0x1F]);
    list.push(0x0014, time);
    list.push(0x0018, util::u16_value(note, 0x20, LE)); // BurstMode2
    list.push(0x001B, util::u8_value(note, 0x23)); // ShutterMode
    list.push(0x001C, util::u8_value(note, 0x21)); // MeteringMode
    list.push(0x001D, util::u16_value(note, 0x24, LE)); // SequenceNumber
    if let Some(fnum100) = openmeta_core::reader::read_u16(note, 0x26, LE) {
        list.push(0x001E, util::make_urational(store.arena_mut(), u32::from(fnum100), 100));
    }
    if let Some(exp100k) = openmeta_core::reader::read_u32(note, 0x28, LE) {
        list.push(0x0020, util::make_urational(store.arena_mut(), exp100k, 100_000));
    }
    list.push(0x0024, util::i16_value(note, 0x2C, LE)); // ExposureCompensation
    list.push(0x0026, util::u16_value(note, 0x2E, LE)); // VariousModes
    list.push(0x0028, util::u16_value(note, 0x30, LE)); // Distance1
    list.push(0x002C, util::u16_value(note, 0x34, LE)); // Distance2
    list.push(0x0030, util::u16_value(note, 0x38, LE)); // Distance3
    list.push(0x0034, util::u16_value(note, 0x3C, LE)); // Distance4
    list.push(0x0038, util::u16_value(note, 0x40, LE)); // FocusMode
    list.push(0x003A, util::u16_value(note, 0x42, LE)); // VariousModes2
    list.push(0x003C, util::u16_value(note, 0x44, LE)); // PanoramaMode
    list.push(0x003E, util::u16_value(note, 0x46, LE)); // SubjectDistance
    list.push(0x0040, util::u8_value(note, 0x48)); // WhiteBalance
    list.push(0x005C, util::u8_value(note, 0x60)); // FlashMode
    list.push(0x005D, util::u8_value(note, 0x5C)); // FlashFired
    list.push(0x005E, util::u8_value(note, 0x66)); // ISOSetting
    list.push(0x0060, util::u8_value(note, 0x68)); // ISO
    if let Some(zoom100) = openmeta_core::reader::read_u16(note, 0x6A, LE) {
        list.push(0x0062, util::make_urational(store.arena_mut(), u32::from(zoom100), 100));
    }
    list.push(0x0064, util::u8_value(note, 0x65)); // DateTimeStamp
    list.push(0x0066, util::u16_value(note, 0x12, LE)); // ColorMode
    list.push(0x0068, util::u8_value(note, 0x5E)); // DigitalZoom
    list.push(0x006B, util::u8_value(note, 0x67)); // Sharpness

    list.emit(&mk.ifd0, store, options, result)
}

/// Bare ASCII serial number at offset 0: at least 8 printable chars mixing
/// digits and letters.
fn decode_serial_only(
    note: &[u8],
    mk: &MkTokens,
    store: &mut MetaStore,
    options: &ExifDecodeOptions,
    result: &mut ExifDecodeResult,
) -> bool {
    if note.len() < 8 {
        return false;
    }
    let n = note
        .iter()
        .take(32)
        .position(|&c| c == 0 || !(0x20..=0x7E).contains(&c))
        .unwrap_or(32.min(note.len()));
    if n < 8 {
        return false;
    }
    let text = &note[..n];
    let have_digit = text.iter().any(u8::is_ascii_digit);
    let have_alpha = text.iter().any(u8::is_ascii_alphabetic);
    if !have_digit || !have_alpha {
        return false;
    }

    let mut list = TagListBuilder::new();
    list.push(0x0000, make_fixed_ascii_text(store.arena_mut(), text));
    list.emit(&mk.ifd0, store, options, result)
}

/// Type6: seven fixed scalar fields; endianness differs by model.
fn decode_type6(
    note: &[u8],
    order: ByteOrder,
    mk: &MkTokens,
    store: &mut MetaStore,
    options: &ExifDecodeOptions,
    result: &mut ExifDecodeResult,
) -> bool {
    if note.len() < 0x24 {
        return false;
    }
    let mut list = TagListBuilder::new();
    list.push(0x0010, util::u32_value(note, 0x10, order)); // ExposureTime
    list.push(0x0014, util::u32_value(note, 0x14, order)); // ISOSetting
    list.push(0x0018, util::u16_value(note, 0x18, order)); // FNumber
    list.push(0x001A, util::u16_value(note, 0x1A, order)); // ISO
    list.push(0x001C, util::u16_value(note, 0x1C, order)); // OpticalZoom
    list.push(0x001E, util::u16_value(note, 0x1E, order)); // DigitalZoom
    list.push(0x0022, util::u16_value(note, 0x22, order)); // Flash
    list.emit(&mk.ifd0, store, options, result)
}

/// Type9: `"IIII"` magic with an ASCII date-time block.
fn decode_type9(
    ctx: &NoteContext<'_>,
    note: &[u8],
    mk: &MkTokens,
    store: &mut MetaStore,
    options: &ExifDecodeOptions,
    result: &mut ExifDecodeResult,
) -> bool {
    if note.len() < 0xC4 + 12 || !ctx.note_starts(b"IIII") {
        return false;
    }
    let mut list = TagListBuilder::new();
    list.push(0x000C, util::u16_value(note, 0x0C, LE)); // FNumber
    list.push(0x0010, util::u32_value(note, 0x10, LE)); // ExposureTime
    list.push(0x0014, util::ascii_text(store.arena_mut(), note, 0x14, 20)); // DateTimeOriginal
    list.push(0x0034, util::u16_value(note, 0x34, LE)); // ISO
    list.push(0x0057, util::ascii_text(store.arena_mut(), note, 0x57, 16)); // FirmwareVersion
    list.push(0x00A8, util::ascii_text(store.arena_mut(), note, 0xA8, 12));
    list.push(0x00C4, util::ascii_text(store.arena_mut(), note, 0xC4, 12));
    list.emit(&mk.ifd0, store, options, result)
}

/// Type4: DC200/DC215 original file name at +0x20.
fn decode_type4(
    note: &[u8],
    mk: &MkTokens,
    store: &mut MetaStore,
    options: &ExifDecodeOptions,
    result: &mut ExifDecodeResult,
) -> bool {
    if note.len() < 0x20 + 12 {
        return false;
    }
    let mut list = TagListBuilder::new();
    list.push(0x0020, util::ascii_text(store.arena_mut(), note, 0x20, 12));
    list.emit(&mk.ifd0, store, options, result)
}

/// Type3: DC240-era fixed block, big-endian.
fn decode_type3(
    note: &[u8],
    mk: &MkTokens,
    store: &mut MetaStore,
    options: &ExifDecodeOptions,
    result: &mut ExifDecodeResult,
) -> bool {
    if note.len() < 0x50 {
        return false;
    }
    let mut list = TagListBuilder::new();
    list.push(0x000C, util::u16_value(note, 0x0C, BE)); // YearCreated
    let month_day = month_day_text(store.arena_mut(), note[0x0E], note[0x0F]);
    list.push(0x000E, month_day);
    let time = time_text(store.arena_mut(), note[0x10], note[0x11], note[0x12], note[0x13]);
    list.push(0x0010, time);
    list.push(0x001E, util::u16_value(note, 0x1E, BE)); // OpticalZoom
    list.push(0x0037, MetaValue::scalar_u64(openmeta_core::ElemType::I8, note[0x37] as i8 as i64 as u64)); // Sharpness
    list.push(0x0038, util::u32_value(note, 0x38, BE)); // ExposureTime
    list.push(0x003C, util::u16_value(note, 0x3C, BE)); // FNumber
    list.push(0x004E, util::u16_value(note, 0x4E, BE)); // ISO
    list.emit(&mk.ifd0, store, options, result)
}

/// Type5: CX42xx/CX62xx fixed block, big-endian.
fn decode_type5(
    note: &[u8],
    mk: &MkTokens,
    store: &mut MetaStore,
    options: &ExifDecodeOptions,
    result: &mut ExifDecodeResult,
) -> bool {
    if note.len() < 0x2C {
        return false;
    }
    let mut list = TagListBuilder::new();
    list.push(0x0014, util::u32_value(note, 0x14, BE)); // ExposureTime
    list.push(0x001A, util::u8_value(note, 0x1A)); // WhiteBalance
    list.push(0x001C, util::u16_value(note, 0x1C, BE)); // FNumber
    list.push(0x001E, util::u16_value(note, 0x1E, BE)); // ISO
    list.push(0x0020, util::u16_value(note, 0x20, BE)); // OpticalZoom
    list.push(0x0022, util::u16_value(note, 0x22, BE)); // DigitalZoom
    list.push(0x0027, util::u8_value(note, 0x27)); // FlashMode
    list.push(0x002A, util::u8_value(note, 0x2A)); // ImageRotated
    list.push(0x002B, util::u8_value(note, 0x2B)); // Macro
    list.emit(&mk.ifd0, store, options, result)
}

/// Type2: maker/model ASCII blocks plus big-endian dimensions.
fn decode_type2(
    note: &[u8],
    mk: &MkTokens,
    store: &mut MetaStore,
    options: &ExifDecodeOptions,
    result: &mut ExifDecodeResult,
) -> bool {
    if note.len() < 0x74 {
        return false;
    }
    if !looks_like_ascii_blob(note, 0x08, 32) || !looks_like_ascii_blob(note, 0x28, 32) {
        return false;
    }
    let Some(width) = openmeta_core::reader::read_u32(note, 0x6C, BE) else {
        return false;
    };
    let Some(height) = openmeta_core::reader::read_u32(note, 0x70, BE) else {
        return false;
    };
    if width == 0 || height == 0 || width > 200_000 || height > 200_000 {
        return false;
    }
    let mut list = TagListBuilder::new();
    list.push(0x0008, util::ascii_text(store.arena_mut(), note, 0x08, 32)); // KodakMaker
    list.push(0x0028, util::ascii_text(store.arena_mut(), note, 0x28, 32)); // KodakModel
    list.push(0x006C, MetaValue::u32(width));
    list.push(0x0070, MetaValue::u32(height));
    list.emit(&mk.ifd0, store, options, result)
}

fn looks_like_ascii_blob(note: &[u8], off: usize, len: usize) -> bool {
    let Some(window) = note.get(off..off + len) else {
        return false;
    };
    let mut have_printable = false;
    for &c in window {
        if c == 0 {
            break;
        }
        if !(0x20..=0x7E).contains(&c) {
            return false;
        }
        have_printable = true;
    }
    have_printable
}

/// Type8a/Type10: a classic IFD whose offsets point into the outer TIFF.
/// Type10 carries a bare endian marker before the IFD; Type8a has none and
/// needs an endianness score.
fn decode_type8_absolute(
    ctx: &NoteContext<'_>,
    mk: &MkTokens,
    store: &mut MetaStore,
    options: &ExifDecodeOptions,
    result: &mut ExifDecodeResult,
) -> bool {
    let note = ctx.note();
    if note.len() < 4 {
        return false;
    }

    // Self-contained TIFF headers belong to the TIFF variant below.
    if let Some(order) = endian_marker(note) {
        let cfg = TiffConfig::classic(order);
        if cfg.read_u16(note, 2) == Some(42) {
            return false;
        }
    }

    let (cfg, ifd_off) = if let Some(order) = endian_marker(note) {
        let cfg = TiffConfig::classic(order);
        let ifd_off = ctx.note_off + 2;
        if !classic::looks_like_classic_ifd(cfg, ctx.tiff, ifd_off, &options.limits) {
            return false;
        }
        (cfg, ifd_off)
    } else {
        let mut best: Option<classic::ClassicIfdCandidate> = None;
        for order in [LE, BE] {
            if let Some(cand) = classic::score_classic_ifd_candidate(
                TiffConfig::classic(order),
                ctx.tiff,
                ctx.note_off,
                &options.limits,
            ) {
                if best.is_none_or(|b| cand.valid_entries > b.valid_entries) {
                    best = Some(cand);
                }
            }
        }
        let Some(best) = best else {
            return false;
        };
        if best.valid_entries < 4 {
            return false;
        }
        (
            TiffConfig::classic(if best.le { LE } else { BE }),
            ctx.note_off,
        )
    };

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
    decode_fc00_subifd(ctx, cfg, mk, store, options, result);
    true
}

fn endian_marker(note: &[u8]) -> Option<ByteOrder> {
    match (note.first().copied()?, note.get(1).copied()?) {
        (b'I', b'I') => Some(LE),
        (b'M', b'M') => Some(BE),
        _ => None,
    }
}

/// Self-contained TIFF variant: a full TIFF header inside the note; offsets
/// are note-relative.
fn decode_tiff_variant(
    note: &[u8],
    mk: &MkTokens,
    store: &mut MetaStore,
    options: &ExifDecodeOptions,
    result: &mut ExifDecodeResult,
) -> bool {
    let Ok(header) = openmeta_core::parse_tiff_header(note) else {
        return false;
    };
    if header.cfg.bigtiff {
        return false;
    }
    if !classic::looks_like_classic_ifd(header.cfg, note, header.first_ifd, &options.limits) {
        return false;
    }
    classic::decode_ifd_no_header(
        header.cfg,
        note,
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

    // FC00-style pointers to an embedded sub-IFD: the declared offset is
    // only approximate on some models, so search near it.
    if let Some(ptr) = fc00_pointer(store, &mk.ifd0) {
        if let Some(best) = find_best_ifd_near(note, u64::from(ptr), 16, options) {
            let cfg = TiffConfig::classic(if best.le { LE } else { BE });
            classic::decode_ifd_no_header(
                cfg,
                note,
                best.offset,
                &mk.subtable("subifd", 0),
                BlockId::INVALID,
                OffsetPolicy::absolute(),
                EntryFlags::NONE,
                store,
                options,
                result,
                |_, _| {},
            );
        }
    }
    true
}

/// FC00 pointer follow-up for the absolute-offset variants.
fn decode_fc00_subifd(
    ctx: &NoteContext<'_>,
    cfg: TiffConfig,
    mk: &MkTokens,
    store: &mut MetaStore,
    options: &ExifDecodeOptions,
    result: &mut ExifDecodeResult,
) {
    if let Some(ptr) = fc00_pointer(store, &mk.ifd0) {
        if let Some(best) = find_best_ifd_near(ctx.tiff, u64::from(ptr), 16, options) {
            let sub_cfg = TiffConfig::classic(if best.le { LE } else { cfg.byte_order });
            classic::decode_ifd_no_header(
                sub_cfg,
                ctx.tiff,
                best.offset,
                &mk.subtable("subifd", 0),
                BlockId::INVALID,
                OffsetPolicy::absolute(),
                EntryFlags::NONE,
                store,
                options,
                result,
                |_, _| {},
            );
        }
    }
}

fn fc00_pointer(store: &MetaStore, ifd: &str) -> Option<u32> {
    store
        .entries()
        .iter()
        .find(|e| match e.key {
            openmeta_core::MetaKey::ExifTag { ifd: token, tag } => {
                tag == 0xFC00 && store.arena().span(token) == ifd.as_bytes()
            }
            _ => false,
        })
        .and_then(|e| e.value.as_u32())
}

/// Best IFD candidate near `approx_off`, preferring higher scores then
/// shorter distance.
fn find_best_ifd_near(
    bytes: &[u8],
    approx_off: u64,
    radius: u64,
    options: &ExifDecodeOptions,
) -> Option<classic::ClassicIfdCandidate> {
    let start = approx_off.saturating_sub(radius);
    let end = (approx_off + radius).min(bytes.len() as u64);
    let mut best: Option<(classic::ClassicIfdCandidate, u64)> = None;

    let mut off = start;
    while off + 2 <= end {
        for order in [LE, BE] {
            let cfg = TiffConfig::classic(order);
            let Some(cand) = classic::score_classic_ifd_candidate(cfg, bytes, off, &options.limits)
            else {
                continue;
            };
            let dist = off.abs_diff(approx_off);
            let better = match &best {
                None => true,
                Some((b, bdist)) => {
                    cand.valid_entries > b.valid_entries
                        || (cand.valid_entries == b.valid_entries && dist < *bdist)
                }
            };
            if better {
                best = Some((cand, dist));
            }
        }
        off += 2;
    }
    best.map(|(c, _)| c)
}
