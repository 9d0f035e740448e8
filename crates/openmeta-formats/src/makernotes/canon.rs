//! Canon MakerNote decoder.
//!
//! The note is a headerless classic IFD, but the base its out-of-line
//! offsets are measured from varies by body and firmware. Three candidate
//! bases - absolute (outer TIFF), MakerNote-relative, and an auto-adjusted
//! base placing the earliest value at the start of the note's value area -
//! are scored by how many values land inside the note and how text-like
//! the ASCII entries read; enumeration order breaks ties.
//!
//! After the main IFD, well-known tags are reinterpreted as derived
//! subtables: CameraSettings/ShotInfo/AFInfo(2)/ColorData word tables,
//! CustomFunctions2 and FilterInfo record lists, PsInfo, and the embedded
//! CameraInfo TIFF block.

use openmeta_core::{
    reader, BlockId, BlockInfo, ByteOrder, DecodeStatus, Entry, EntryFlags, EntryOrigin, MetaKey,
    MetaStore, MetaValue, TiffConfig, TiffType, WireType,
};

use super::util::{self, TableElem, TagListBuilder};
use super::{MkTokens, NoteContext};
use crate::exif::classic::{self, OffsetPolicy};
use crate::exif::{ExifDecodeOptions, ExifDecodeResult};

pub(crate) fn detect(ctx: &NoteContext<'_>) -> bool {
    ctx.make_has("CANON")
}

pub(crate) fn decode(
    ctx: &NoteContext<'_>,
    mk: &MkTokens,
    store: &mut MetaStore,
    options: &ExifDecodeOptions,
    result: &mut ExifDecodeResult,
) -> bool {
    let tiff = ctx.tiff;
    let mut cfg = ctx.cfg;
    cfg.bigtiff = false;

    // Some Canon notes are little-endian inside a big-endian EXIF stream.
    let mut entry_count = cfg.read_u16(tiff, ctx.note_off).unwrap_or(0);
    if entry_count == 0 || u32::from(entry_count) > options.limits.max_entries_per_ifd {
        cfg.byte_order = flip(cfg.byte_order);
        entry_count = match cfg.read_u16(tiff, ctx.note_off) {
            Some(c) => c,
            None => return false,
        };
    }
    if entry_count == 0 || u32::from(entry_count) > options.limits.max_entries_per_ifd {
        return false;
    }
    let entries_off = ctx.note_off + 2;
    let needed = 2 + u64::from(entry_count) * 12 + 4;
    if needed > tiff.len() as u64 - ctx.note_off {
        return false;
    }
    // Truncated directories happen; treat the declared note length as a
    // soft bound when it undershoots the directory itself.
    let note_span = ctx.note_len.max(needed);

    let value_base = guess_value_base(cfg, tiff, ctx.note_off, note_span, entry_count, needed, options);

    let Some(token) = store.arena_mut().intern(mk.ifd0.as_bytes()) else {
        return true;
    };
    let block = store.add_block(BlockInfo {
        token,
        parent: BlockId::INVALID,
        wire_offset: ctx.note_off,
        derived: false,
    });
    if !block.is_valid() {
        return true;
    }
    result.ifds_walked += 1;

    for i in 0..u64::from(entry_count) {
        let entry_off = entries_off + i * 12;
        let Some(raw) = classic::read_ifd_entry(cfg, tiff, entry_off) else {
            return true;
        };
        let Some(wire_type) = TiffType::from_u16(raw.wire_type) else {
            continue;
        };
        let Some(value_bytes) = classic::entry_value_bytes(&raw) else {
            continue;
        };
        if value_bytes > u64::from(options.limits.max_value_bytes) {
            result.update(DecodeStatus::LimitExceeded);
            continue;
        }
        let abs_value_off = if value_bytes <= 4 {
            raw.value_field_off
        } else {
            value_base + raw.value_or_off
        };
        if abs_value_off + value_bytes > tiff.len() as u64 {
            result.update(DecodeStatus::Malformed);
            continue;
        }
        if !result.entry_budget_left(&options.limits) {
            result.update(DecodeStatus::LimitExceeded);
            return true;
        }

        let vref = classic::IfdValueRef {
            value_off: abs_value_off,
            value_bytes,
            inline: value_bytes <= 4,
        };
        let (value, value_flags) = classic::decode_tiff_value(
            cfg,
            tiff,
            wire_type,
            raw.count,
            vref,
            store.arena_mut(),
            &options.limits,
        );
        store.add_entry(Entry {
            key: MetaKey::ExifTag { ifd: token, tag: raw.tag },
            value,
            origin: EntryOrigin {
                block,
                order_in_block: i as u32,
                wire: WireType::tiff(raw.wire_type),
                wire_count: raw.count as u32,
            },
            flags: value_flags,
        });
        result.entries_emitted += 1;

        decode_subtable(ctx, cfg, mk, &raw, abs_value_off, value_bytes, store, options, result);
    }
    true
}

/// Custom-function tables live under their own `mk_canoncustom` prefix.
fn canoncustom_token(mk: &MkTokens, subtable: &str) -> String {
    let prefix = mk.prefix.replace("mk_canon", "mk_canoncustom");
    classic::make_mk_subtable_ifd_token(&prefix, subtable, 0)
}

fn flip(order: ByteOrder) -> ByteOrder {
    match order {
        ByteOrder::LittleEndian => ByteOrder::BigEndian,
        ByteOrder::BigEndian => ByteOrder::LittleEndian,
    }
}

fn looks_like_text(raw: &[u8]) -> bool {
    let end = raw.iter().position(|&b| b == 0).unwrap_or(raw.len());
    end > 0 && raw[..end].iter().all(|&b| (0x20..=0x7E).contains(&b))
}

/// Pick the offset base for out-of-line values.
///
/// Candidates in enumeration order: absolute, note-relative, auto-adjusted.
/// Strictly-greater score wins, so the earlier candidate survives a tie;
/// the in-note count is the secondary criterion.
fn guess_value_base(
    cfg: TiffConfig,
    tiff: &[u8],
    note_off: u64,
    note_span: u64,
    entry_count: u16,
    ifd_needed: u64,
    options: &ExifDecodeOptions,
) -> u64 {
    let entries_off = note_off + 2;

    // Earliest out-of-line offset field, for the auto-adjusted base.
    let mut min_off = u64::MAX;
    for i in 0..u64::from(entry_count) {
        let Some(raw) = classic::read_ifd_entry(cfg, tiff, entries_off + i * 12) else {
            break;
        };
        let Some(value_bytes) = classic::entry_value_bytes(&raw) else {
            continue;
        };
        if raw.count == 0
            || value_bytes <= 4
            || value_bytes > u64::from(options.limits.max_value_bytes)
        {
            continue;
        }
        min_off = min_off.min(raw.value_or_off);
    }

    let base_auto = if min_off != u64::MAX {
        let value_area = note_off + ifd_needed;
        (min_off <= value_area).then(|| value_area - min_off)
    } else {
        None
    };

    let mut best_base = 0u64;
    let mut best_score = 0u32;
    let mut best_in_note = 0u32;
    let candidates = [Some(0), Some(note_off), base_auto];
    for candidate in candidates.into_iter() {
        let Some(base) = candidate else {
            continue;
        };
        let mut score = 0u32;
        let mut in_note = 0u32;
        for i in 0..u64::from(entry_count) {
            let Some(raw) = classic::read_ifd_entry(cfg, tiff, entries_off + i * 12) else {
                break;
            };
            let Some(value_bytes) = classic::entry_value_bytes(&raw) else {
                continue;
            };
            if raw.count == 0
                || value_bytes <= 4
                || value_bytes > u64::from(options.limits.max_value_bytes)
            {
                continue;
            }
            let Some(abs_off) = base.checked_add(raw.value_or_off) else {
                continue;
            };
            if abs_off + value_bytes > tiff.len() as u64 {
                continue;
            }
            score += 1;
            if abs_off >= note_off && abs_off + value_bytes <= note_off + note_span {
                in_note += 1;
                score += 1;
                if abs_off >= note_off + ifd_needed {
                    score += 1;
                }
            }
            if (raw.wire_type == 2 || raw.wire_type == 129)
                && looks_like_text(&tiff[abs_off as usize..(abs_off + value_bytes) as usize])
            {
                score += 3;
            }
        }
        // Strictly greater wins, so the earlier candidate keeps outright
        // ties; the in-note count is the secondary criterion.
        if score > best_score || (score == best_score && in_note > best_in_note) {
            best_base = base;
            best_score = score;
            best_in_note = in_note;
        }
    }
    best_base
}

/// Count-based scalar table read straight from the stream.
#[allow(clippy::too_many_arguments)]
fn stream_table(
    cfg: TiffConfig,
    tiff: &[u8],
    value_off: u64,
    count: u32,
    elem: TableElem,
    ifd_name: &str,
    store: &mut MetaStore,
    options: &ExifDecodeOptions,
    result: &mut ExifDecodeResult,
) {
    let elem_size = match elem {
        TableElem::U8 => 1u64,
        TableElem::U16 | TableElem::I16 => 2,
        TableElem::U32 | TableElem::I32 => 4,
    };
    let Some(window) = reader::window(tiff, value_off, u64::from(count) * elem_size) else {
        return;
    };
    util::emit_scalar_table(ifd_name, window, elem, cfg.byte_order, store, options, result);
}

/// Per-entry subtable dispatch after the main IFD entry was emitted.
#[allow(clippy::too_many_arguments)]
fn decode_subtable(
    ctx: &NoteContext<'_>,
    cfg: TiffConfig,
    mk: &MkTokens,
    raw: &classic::RawIfdEntry,
    value_off: u64,
    value_bytes: u64,
    store: &mut MetaStore,
    options: &ExifDecodeOptions,
    result: &mut ExifDecodeResult,
) {
    let tiff = ctx.tiff;
    let count = raw.count as u32;

    // CameraInfo (0x000D, UNDEFINED): an embedded TIFF-like block; locate a
    // plausible IFD inside it, else fall back to the fixed-layout fields.
    if raw.tag == 0x000D && raw.wire_type == 7 && value_bytes != 0 {
        let cam = &tiff[value_off as usize..(value_off + value_bytes) as usize];
        if let Some(best) = classic::find_best_classic_ifd_candidate(cam, 512, &options.limits) {
            let cam_cfg = TiffConfig::classic(if best.le {
                ByteOrder::LittleEndian
            } else {
                ByteOrder::BigEndian
            });
            classic::decode_ifd_no_header(
                cam_cfg,
                cam,
                best.offset,
                &mk.subtable("camerainfo", 0),
                BlockId::INVALID,
                OffsetPolicy::absolute(),
                EntryFlags::DERIVED,
                store,
                options,
                result,
                |_, _| {},
            );
        } else {
            decode_camerainfo_fixed(cfg, cam, mk, store, options, result);
        }
        // Some models embed a PictureStyleInfo table in the blob tail.
        if value_bytes > 0x025B {
            let ps_off = value_off + 0x025B;
            let ps_bytes = value_bytes - 0x025B;
            if ps_bytes >= 0x00DC + 2 && ps_off + ps_bytes <= tiff.len() as u64 {
                decode_psinfo(tiff, ps_off, ps_bytes, &mk.subtable("psinfo", 0), store, options, result);
            }
        }
    }

    // LensInfo (0x4019): raw lens serial bytes.
    if raw.tag == 0x4019 && raw.wire_type == 7 && value_bytes != 0 {
        let serial_bytes = value_bytes.min(5);
        let mut list = TagListBuilder::new();
        list.push(0x0000, util::bytes_value(store.arena_mut(), tiff, value_off, serial_bytes));
        list.emit(&mk.subtable("lensinfo", 0), store, options, result);
    }

    // CustomFunctions2 (0x0099): record list with a u16 length header.
    if raw.tag == 0x0099 && value_bytes != 0 {
        decode_record_list(
            cfg,
            tiff,
            value_off,
            value_bytes,
            LengthHeader::U16,
            &canoncustom_token(mk, "functions2"),
            store,
            options,
            result,
        );
    }

    // VignettingCorr (0x4011): plain word table.
    if raw.tag == 0x4011 && raw.wire_type == 7 && value_bytes >= 2 && value_bytes % 2 == 0 {
        stream_table(
            cfg,
            tiff,
            value_off,
            (value_bytes / 2) as u32,
            TableElem::U16,
            &mk.subtable("vignettingcorr", 0),
            store,
            options,
            result,
        );
    }

    if raw.wire_type == 3 && count != 0 {
        let table = match raw.tag {
            0x0001 => Some(("camerasettings", TableElem::U16)),
            0x0005 => Some(("panorama", TableElem::U16)),
            0x0012 => Some(("afinfo", TableElem::U16)),
            0x0004 => Some(("shotinfo", TableElem::U16)),
            0x0093 => Some(("fileinfo", TableElem::U16)),
            0x0098 => Some(("cropinfo", TableElem::U16)),
            0x001D => Some(("mycolors", TableElem::U16)),
            0x00E0 => Some(("sensorinfo", TableElem::U16)),
            0x00A0 => Some(("processing", TableElem::U16)),
            _ => None,
        };
        if let Some((name, elem)) = table {
            stream_table(cfg, tiff, value_off, count, elem, &mk.subtable(name, 0), store, options, result);
        }

        match raw.tag {
            0x0002 => {
                // FocalLength: sanity-check the focal-plane size words.
                let plausible = count <= 3 || {
                    let x = cfg.read_u16(tiff, value_off + 4).unwrap_or(0);
                    let y = cfg.read_u16(tiff, value_off + 6).unwrap_or(0);
                    x > 0 && y > 0 && x <= 5000 && y <= 5000
                };
                let name = if plausible { "focallength" } else { "focallength_unknown" };
                stream_table(cfg, tiff, value_off, count, TableElem::U16, &mk.subtable(name, 0), store, options, result);
            }
            0x0026 => {
                decode_afinfo2(cfg, tiff, value_off, value_bytes, &mk.subtable("afinfo2", 0), store, options, result);
            }
            0x0090 => {
                let name = canoncustom_token(mk, "functions1d");
                decode_custom_word_table(cfg, tiff, value_off, count, &name, 0x0000, true, store, options, result);
            }
            0x0091 => {
                let name = canoncustom_token(mk, "personalfuncs");
                decode_custom_word_table(cfg, tiff, value_off, count, &name, 0x0001, true, store, options, result);
            }
            0x0092 => {
                let name = canoncustom_token(mk, "personalfuncvalues");
                decode_custom_word_table(cfg, tiff, value_off, count, &name, 0x0001, false, store, options, result);
            }
            0x00AA => {
                // MeasuredColor: RGGB quad at words 1..4.
                if count >= 5 {
                    let mut rggb = [0u16; 4];
                    for (k, v) in rggb.iter_mut().enumerate() {
                        *v = cfg.read_u16(tiff, value_off + 2 * (k as u64 + 1)).unwrap_or(0);
                    }
                    let value = util::u16_slice_value(store.arena_mut(), &rggb);
                    let mut list = TagListBuilder::new();
                    list.push(0x0001, value);
                    list.emit(&mk.subtable("measuredcolor", 0), store, options, result);
                } else {
                    stream_table(cfg, tiff, value_off, count, TableElem::U16, &mk.subtable("measuredcolor", 0), store, options, result);
                }
            }
            0x4001 => {
                // ColorData: the ColorData8 variant is probed by a colour
                // temperature sentinel at word 0x010A.
                let is_colordata8 = count > 0x0107 + 3 && {
                    let sentinel = cfg
                        .read_u16(tiff, value_off + 2 * (0x0107 + 3))
                        .unwrap_or(0);
                    (1500..=20000).contains(&sentinel)
                };
                let name = if is_colordata8 { "colordata8" } else { "colordata" };
                stream_table(cfg, tiff, value_off, count, TableElem::U16, &mk.subtable(name, 0), store, options, result);
                if is_colordata8 {
                    decode_colorcalib(cfg, tiff, value_off, count, &mk.subtable("colorcalib", 0), store, options, result);
                }
            }
            _ => {}
        }
    } else if raw.wire_type == 4 && count != 0 {
        let table = match raw.tag {
            0x0035 => Some(("timeinfo", TableElem::U32)),
            0x009A => Some(("aspectinfo", TableElem::U32)),
            0x000D => Some(("camerainfo", TableElem::U32)),
            0x4016 => Some(("vignettingcorr2", TableElem::U32)),
            0x4018 => Some(("lightingopt", TableElem::U32)),
            0x4021 => Some(("multiexp", TableElem::I32)),
            0x4025 => Some(("hdrinfo", TableElem::U32)),
            0x4028 => Some(("afconfig", TableElem::I32)),
            0x403F => Some(("rawburstinfo", TableElem::U32)),
            _ => None,
        };
        if let Some((name, elem)) = table {
            stream_table(cfg, tiff, value_off, count, elem, &mk.subtable(name, 0), store, options, result);
        }
        match raw.tag {
            0x4013 => {
                // AFMicroAdj: mode + adjustment rational.
                if value_bytes >= 16 {
                    let mode = cfg.read_u32(tiff, value_off + 4).unwrap_or(0);
                    let numer = cfg.read_u32(tiff, value_off + 8).unwrap_or(0);
                    let denom = cfg.read_u32(tiff, value_off + 12).unwrap_or(0);
                    let mut list = TagListBuilder::new();
                    list.push(0x0001, MetaValue::u32(mode));
                    list.push(0x0002, util::make_urational(store.arena_mut(), numer, denom));
                    list.emit(&mk.subtable("afmicroadj", 0), store, options, result);
                } else {
                    stream_table(cfg, tiff, value_off, count, TableElem::U32, &mk.subtable("afmicroadj", 0), store, options, result);
                }
            }
            0x4024 => {
                // FilterInfo: record list with a u32 length header.
                decode_record_list(
                    cfg,
                    tiff,
                    value_off,
                    value_bytes,
                    LengthHeader::U32,
                    &mk.subtable("filterinfo", 0),
                    store,
                    options,
                    result,
                );
            }
            _ => {}
        }
    }
}

/// CameraInfo fixed-layout fallback for models without an embedded IFD.
fn decode_camerainfo_fixed(
    cfg: TiffConfig,
    cam: &[u8],
    mk: &MkTokens,
    store: &mut MetaStore,
    options: &ExifDecodeOptions,
    result: &mut ExifDecodeResult,
) {
    let mut list = TagListBuilder::new();
    list.push(0x0041, util::u8_value(cam, 0x41)); // SharpnessFrequency
    list.push(0x0042, util::u8_value(cam, 0x42)); // Sharpness
    list.push(0x0044, util::u8_value(cam, 0x44)); // WhiteBalance
    list.push(0x0048, util::u16_value(cam, 0x48, cfg.byte_order)); // ColorTemperature
    list.push(0x004B, util::u8_value(cam, 0x4B)); // PictureStyle
    list.emit(&mk.subtable("camerainfo", 0), store, options, result);
}

/// PsInfo: little-endian i32 fields at even byte offsets, with three u16
/// user-defined style fields at the tail.
fn decode_psinfo(
    tiff: &[u8],
    value_off: u64,
    value_bytes: u64,
    ifd_name: &str,
    store: &mut MetaStore,
    options: &ExifDecodeOptions,
    result: &mut ExifDecodeResult,
) {
    const LE: ByteOrder = ByteOrder::LittleEndian;
    let mut list = TagListBuilder::new();
    let mut tag = 0u16;
    while u64::from(tag) + 2 <= value_bytes && tag <= 0x00DC {
        if matches!(tag, 0x00D8 | 0x00DA | 0x00DC) {
            list.push(tag, util::u16_value(tiff, value_off + u64::from(tag), LE));
        } else if u64::from(tag) + 4 <= value_bytes {
            if let Some(v) = reader::read_i32(tiff, value_off + u64::from(tag), LE) {
                list.push(tag, MetaValue::i32(v));
            }
        }
        tag += 2;
    }
    list.emit(ifd_name, store, options, result);
}

/// AFInfo2: size-validated header words, four per-point arrays of length
/// NumAFPoints, then three trailing scalars.
#[allow(clippy::too_many_arguments)]
fn decode_afinfo2(
    cfg: TiffConfig,
    tiff: &[u8],
    value_off: u64,
    value_bytes: u64,
    ifd_name: &str,
    store: &mut MetaStore,
    options: &ExifDecodeOptions,
    result: &mut ExifDecodeResult,
) {
    if value_bytes < 16 || value_bytes % 2 != 0 || value_off + value_bytes > tiff.len() as u64 {
        return;
    }
    let word_count = (value_bytes / 2) as u32;
    let Some(size_bytes) = cfg.read_u16(tiff, value_off) else {
        return;
    };
    if u64::from(size_bytes) != value_bytes {
        return;
    }
    let Some(num_points) = cfg.read_u16(tiff, value_off + 4) else {
        return;
    };
    if num_points == 0 || u32::from(num_points) > options.limits.max_entries_per_ifd {
        return;
    }
    let n = u32::from(num_points);
    if word_count < 1 + 7 + 4 * n + 3 {
        return;
    }

    let word = |idx: u32| cfg.read_u16(tiff, value_off + u64::from(idx) * 2).unwrap_or(0);
    let mut list = TagListBuilder::new();
    // [0]=size, [1]=AFAreaMode, [2]=NumAFPoints, [3]=ValidAFPoints,
    // [4..7]=image dimensions.
    for idx in 0..8u32 {
        list.push(idx as u16, MetaValue::u16(word(idx)));
    }

    let base = 8u32;
    for (arr, tag, signed) in [
        (0u32, 0x0008u16, false), // widths
        (1, 0x0009, false),       // heights
        (2, 0x000A, true),        // x positions
        (3, 0x000B, true),        // y positions
    ] {
        let start = base + arr * n;
        if signed {
            let mut values = Vec::with_capacity(n as usize);
            for k in 0..n {
                values.push(word(start + k) as i16);
            }
            list.push(tag, util::i16_slice_value(store.arena_mut(), &values));
        } else {
            let mut values = Vec::with_capacity(n as usize);
            for k in 0..n {
                values.push(word(start + k));
            }
            list.push(tag, util::u16_slice_value(store.arena_mut(), &values));
        }
    }

    for (k, tag) in [(0u32, 0x000Cu16), (1, 0x000D), (2, 0x000E)] {
        list.push(tag, MetaValue::u16(word(base + 4 * n + k)));
    }
    list.emit(ifd_name, store, options, result);
}

/// Custom-function word tables: tag base plus per-word entries, either the
/// low byte (functions/personal funcs) or the full u16 (values).
#[allow(clippy::too_many_arguments)]
fn decode_custom_word_table(
    cfg: TiffConfig,
    tiff: &[u8],
    value_off: u64,
    count: u32,
    ifd_name: &str,
    tag_base: u16,
    low_byte: bool,
    store: &mut MetaStore,
    options: &ExifDecodeOptions,
    result: &mut ExifDecodeResult,
) {
    let mut list = TagListBuilder::new();
    for i in 0..count.min(options.limits.max_entries_per_ifd) {
        let Some(v) = cfg.read_u16(tiff, value_off + u64::from(i) * 2) else {
            break;
        };
        let tag = tag_base.wrapping_add(i as u16);
        if low_byte {
            list.push(tag, MetaValue::u8((v & 0xFF) as u8));
        } else {
            list.push(tag, MetaValue::u16(v));
        }
    }
    list.emit(ifd_name, store, options, result);
}

enum LengthHeader {
    U16,
    U32,
}

/// CustomFunctions2 / FilterInfo record lists: a length header, a group
/// count, then `(num, len, count)` record headers wrapping `(tag, n,
/// u32[n])` items.
#[allow(clippy::too_many_arguments)]
fn decode_record_list(
    cfg: TiffConfig,
    tiff: &[u8],
    value_off: u64,
    value_bytes: u64,
    header: LengthHeader,
    ifd_name: &str,
    store: &mut MetaStore,
    options: &ExifDecodeOptions,
    result: &mut ExifDecodeResult,
) {
    if value_bytes < 8 || value_off + value_bytes > tiff.len() as u64 {
        return;
    }
    let declared = match header {
        LengthHeader::U16 => cfg.read_u16(tiff, value_off).map(u64::from),
        LengthHeader::U32 => cfg.read_u32(tiff, value_off).map(u64::from),
    };
    if declared != Some(value_bytes) {
        return;
    }

    let Some(token) = store.arena_mut().intern(ifd_name.as_bytes()) else {
        return;
    };
    let block = store.add_block(BlockInfo {
        token,
        parent: BlockId::INVALID,
        wire_offset: value_off,
        derived: true,
    });
    if !block.is_valid() {
        return;
    }

    let end = value_off + value_bytes;
    let mut pos = value_off + 8;
    let mut order = 0u32;

    while pos + 12 <= end {
        let (Some(_rec_num), Some(rec_len), Some(rec_count)) = (
            cfg.read_u32(tiff, pos),
            cfg.read_u32(tiff, pos + 4),
            cfg.read_u32(tiff, pos + 8),
        ) else {
            result.update(DecodeStatus::Malformed);
            return;
        };
        if rec_len < 8 {
            break;
        }
        pos += 12;
        let rec_end = pos + u64::from(rec_len) - 8;
        if rec_end > end {
            result.update(DecodeStatus::Malformed);
            return;
        }

        let mut rec_pos = pos;
        let mut i = 0u32;
        while rec_pos + 8 <= rec_end && i < rec_count {
            let (Some(tag32), Some(num)) =
                (cfg.read_u32(tiff, rec_pos), cfg.read_u32(tiff, rec_pos + 4))
            else {
                result.update(DecodeStatus::Malformed);
                return;
            };
            if tag32 > 0xFFFF || num == 0 {
                break;
            }
            if num > options.limits.max_entries_per_ifd {
                result.update(DecodeStatus::LimitExceeded);
                break;
            }
            let payload_bytes = u64::from(num) * 4;
            if payload_bytes > u64::from(options.limits.max_value_bytes) {
                result.update(DecodeStatus::LimitExceeded);
                break;
            }
            let payload_off = rec_pos + 8;
            let next = payload_off + payload_bytes;
            if next > rec_end {
                break;
            }
            if !result.entry_budget_left(&options.limits) {
                result.update(DecodeStatus::LimitExceeded);
                return;
            }

            let value = if num == 1 {
                match cfg.read_u32(tiff, payload_off) {
                    Some(v) => MetaValue::u32(v),
                    None => MetaValue::empty(),
                }
            } else {
                let Some(span) = store.arena_mut().allocate(num * 4, 4) else {
                    result.update(DecodeStatus::LimitExceeded);
                    return;
                };
                for k in 0..num {
                    let v = cfg.read_u32(tiff, payload_off + u64::from(k) * 4).unwrap_or(0);
                    let dst = (k * 4) as usize;
                    store.arena_mut().span_mut(span)[dst..dst + 4]
                        .copy_from_slice(&v.to_le_bytes());
                }
                MetaValue::array(openmeta_core::ElemType::U32, num, span)
            };

            store.add_entry(Entry {
                key: MetaKey::ExifTag { ifd: token, tag: tag32 as u16 },
                value,
                origin: EntryOrigin {
                    block,
                    order_in_block: order,
                    wire: WireType::vendor(4),
                    wire_count: num,
                },
                flags: EntryFlags::DERIVED,
            });
            result.entries_emitted += 1;
            order += 1;
            rec_pos = next;
            i += 1;
        }

        pos = rec_end;
    }
}

/// ColorCalib inside ColorData8: 15 records of 4 int16 at word 0x0107.
#[allow(clippy::too_many_arguments)]
fn decode_colorcalib(
    cfg: TiffConfig,
    tiff: &[u8],
    colordata_off: u64,
    colordata_count: u32,
    ifd_name: &str,
    store: &mut MetaStore,
    options: &ExifDecodeOptions,
    result: &mut ExifDecodeResult,
) {
    if colordata_count <= 0x0107 + 4 * 15 - 1 {
        return;
    }
    let base = colordata_off + 2 * 0x0107;
    if base + 120 > tiff.len() as u64 {
        return;
    }
    let mut list = TagListBuilder::new();
    for k in 0..15u32 {
        let mut vals = [0i16; 4];
        for (j, v) in vals.iter_mut().enumerate() {
            *v = cfg
                .read_u16(tiff, base + u64::from(4 * k + j as u32) * 2)
                .unwrap_or(0) as i16;
        }
        list.push((4 * k) as u16, util::i16_slice_value(store.arena_mut(), &vals));
    }
    list.emit(ifd_name, store, options, result);
}
