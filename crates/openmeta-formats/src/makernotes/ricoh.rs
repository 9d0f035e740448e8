//! Ricoh MakerNote decoder.
//!
//! Ricoh bodies disagree about where MakerNote offsets point. The main IFD
//! (normally at note+8) stores out-of-line values against one of three
//! bases - note+8, note+0, or the outer TIFF - and the right one varies
//! per entry, so text-typed entries are resolved by scoring all readable
//! candidates for ASCII plausibility.
//!
//! Post-passes: ImageInfo (0x1001) as a u8 table, the `[Ricoh Camera Info]`
//! Subdir (0x2001, blob or pointer form) holding a big-endian IFD whose
//! values live in the outer TIFF, FaceInfo (0x001A inside the Subdir), and
//! ThetaSubdir (0x4001) as a plain sub-IFD pointer.

use openmeta_core::{
    reader, BlockId, BlockInfo, ByteOrder, DecodeStatus, Entry, EntryFlags, EntryOrigin, MetaKey,
    MetaStore, MetaValue, TiffConfig, TiffType, ValueKind, WireType,
};

use super::util::{self, TableElem, TagListBuilder};
use super::{MkTokens, NoteContext};
use crate::exif::classic::{self, ClassicIfdCandidate, OffsetPolicy};
use crate::exif::{ExifDecodeOptions, ExifDecodeResult};

const SUBDIR_MARKER: &[u8] = b"[Ricoh Camera Info]";
const TAG_IMAGE_INFO: u16 = 0x1001;
const TAG_SUBDIR: u16 = 0x2001;
const TAG_THETA_SUBDIR: u16 = 0x4001;
const TAG_FACE_INFO: u16 = 0x001A;

pub(crate) fn detect(ctx: &NoteContext<'_>) -> bool {
    ctx.note_starts(b"RICOH") || ctx.note_starts(b"Ricoh") || ctx.make_has("RICOH")
}

pub(crate) fn decode(
    ctx: &NoteContext<'_>,
    mk: &MkTokens,
    store: &mut MetaStore,
    options: &ExifDecodeOptions,
    result: &mut ExifDecodeResult,
) -> bool {
    let note = ctx.note();

    if decode_type2_ricoh_header(note, mk, store, options, result) {
        return true;
    }
    if decode_type2_padded(note, mk, store, options, result) {
        return true;
    }

    // Main IFD normally sits at note+8, sometimes +10 (extra padding), in
    // either endianness; pick the best-scoring candidate.
    let mut best: Option<ClassicIfdCandidate> = None;
    for off in [8u64, 10] {
        for order in [ByteOrder::LittleEndian, ByteOrder::BigEndian] {
            let cfg = TiffConfig::classic(order);
            if let Some(cand) = classic::score_classic_ifd_candidate(cfg, note, off, &options.limits)
            {
                if best.is_none_or(|b| cand.valid_entries > b.valid_entries) {
                    best = Some(cand);
                }
            }
        }
    }
    let best = match best {
        Some(b) => b,
        None => match classic::find_best_classic_ifd_candidate(note, 256, &options.limits) {
            Some(b) => b,
            None => return false,
        },
    };

    let cfg = TiffConfig::classic(if best.le {
        ByteOrder::LittleEndian
    } else {
        ByteOrder::BigEndian
    });
    decode_main_ifd_with_fallback(ctx, cfg, best.offset, 8, mk, store, options, result);

    decode_binary_subdirs(ctx, mk, store, options, result);
    true
}

/// `"RICOH"` magic + little-endian directory: count at +8, two pad bytes,
/// entries at +12, offsets relative to the note.
fn decode_type2_ricoh_header(
    note: &[u8],
    mk: &MkTokens,
    store: &mut MetaStore,
    options: &ExifDecodeOptions,
    result: &mut ExifDecodeResult,
) -> bool {
    if note.len() < 16 || !reader::match_bytes(note, 0, b"RICOH") {
        return false;
    }
    let cfg = TiffConfig::classic(ByteOrder::LittleEndian);
    let Some(entry_count) = cfg.read_u16(note, 8) else {
        return false;
    };
    if entry_count == 0 || u32::from(entry_count) > options.limits.max_entries_per_ifd {
        return false;
    }
    let entries_off = 12u64;
    if entries_off + u64::from(entry_count) * 12 + 4 > note.len() as u64 {
        return false;
    }
    let name = mk.subtable("type2", 0);
    emit_plain_entries(cfg, note, entries_off, entry_count, &name, store, options, result);
    true
}

/// Full TIFF header inside the note ("Type2" of HZ15 / XG-1 pedigree), with
/// an occasional two-byte pad after the entry count.
fn decode_type2_padded(
    note: &[u8],
    mk: &MkTokens,
    store: &mut MetaStore,
    options: &ExifDecodeOptions,
    result: &mut ExifDecodeResult,
) -> bool {
    if note.len() < 16 {
        return false;
    }
    let order = match (note[0], note[1]) {
        (b'I', b'I') => ByteOrder::LittleEndian,
        (b'M', b'M') => ByteOrder::BigEndian,
        _ => return false,
    };
    let cfg = TiffConfig::classic(order);
    if cfg.read_u16(note, 2) != Some(42) {
        return false;
    }
    let Some(ifd0_off) = cfg.read_u32(note, 4).map(u64::from) else {
        return false;
    };
    if ifd0_off == 0 || ifd0_off + 8 > note.len() as u64 {
        return false;
    }
    let Some(entry_count) = cfg.read_u16(note, ifd0_off) else {
        return false;
    };
    if entry_count == 0 || u32::from(entry_count) > options.limits.max_entries_per_ifd {
        return false;
    }
    let padded = note[(ifd0_off + 2) as usize] == 0 && note[(ifd0_off + 3) as usize] == 0;
    let entries_off = ifd0_off + if padded { 4 } else { 2 };
    if entries_off + u64::from(entry_count) * 12 + 4 > note.len() as u64 {
        return false;
    }
    emit_plain_entries(cfg, note, entries_off, entry_count, &mk.ifd0, store, options, result);
    true
}

/// Straight entry loop with note-relative offsets (no base fallback).
#[allow(clippy::too_many_arguments)]
fn emit_plain_entries(
    cfg: TiffConfig,
    note: &[u8],
    entries_off: u64,
    entry_count: u16,
    ifd_name: &str,
    store: &mut MetaStore,
    options: &ExifDecodeOptions,
    result: &mut ExifDecodeResult,
) {
    let Some(token) = store.arena_mut().intern(ifd_name.as_bytes()) else {
        return;
    };
    let block = store.add_block(BlockInfo {
        token,
        parent: BlockId::INVALID,
        wire_offset: entries_off,
        derived: false,
    });
    if !block.is_valid() {
        return;
    }
    result.ifds_walked += 1;

    for i in 0..u64::from(entry_count) {
        let entry_off = entries_off + i * 12;
        let Some(raw) = classic::read_ifd_entry(cfg, note, entry_off) else {
            return;
        };
        if !result.entry_budget_left(&options.limits) {
            result.update(DecodeStatus::LimitExceeded);
            return;
        }
        let (value, flags) = match TiffType::from_u16(raw.wire_type)
            .and_then(|t| classic::resolve_value_ref(cfg, &raw, OffsetPolicy::absolute()).map(|v| (t, v)))
        {
            Some((wire_type, vref)) => classic::decode_tiff_value(
                cfg,
                note,
                wire_type,
                raw.count,
                vref,
                store.arena_mut(),
                &options.limits,
            ),
            None => (MetaValue::empty(), EntryFlags::UNREADABLE),
        };
        if flags.contains(EntryFlags::UNREADABLE) {
            result.update(DecodeStatus::Malformed);
        }
        store.add_entry(Entry {
            key: MetaKey::ExifTag { ifd: token, tag: raw.tag },
            value,
            origin: EntryOrigin {
                block,
                order_in_block: i as u32,
                wire: WireType::tiff(raw.wire_type),
                wire_count: raw.count as u32,
            },
            flags,
        });
        result.entries_emitted += 1;
    }
}

/// Main IFD decode with the per-entry three-base fallback.
#[allow(clippy::too_many_arguments)]
fn decode_main_ifd_with_fallback(
    ctx: &NoteContext<'_>,
    cfg: TiffConfig,
    ifd_off: u64,
    base: u64,
    mk: &MkTokens,
    store: &mut MetaStore,
    options: &ExifDecodeOptions,
    result: &mut ExifDecodeResult,
) {
    let note = ctx.note();
    let Some(entry_count) = cfg.read_u16(note, ifd_off) else {
        return;
    };
    if entry_count == 0 || u32::from(entry_count) > options.limits.max_entries_per_ifd {
        return;
    }
    let entries_off = ifd_off + 2;
    if entries_off + u64::from(entry_count) * 12 + 4 > note.len() as u64 {
        return;
    }

    let Some(token) = store.arena_mut().intern(mk.ifd0.as_bytes()) else {
        return;
    };
    let block = store.add_block(BlockInfo {
        token,
        parent: BlockId::INVALID,
        wire_offset: ctx.note_off + ifd_off,
        derived: false,
    });
    if !block.is_valid() {
        return;
    }
    result.ifds_walked += 1;

    for i in 0..u64::from(entry_count) {
        let entry_off = entries_off + i * 12;
        let Some(raw) = classic::read_ifd_entry(cfg, note, entry_off) else {
            return;
        };
        let wire_type = TiffType::from_u16(raw.wire_type);
        let value_bytes = classic::entry_value_bytes(&raw);
        if !result.entry_budget_left(&options.limits) {
            result.update(DecodeStatus::LimitExceeded);
            return;
        }

        let mut flags = EntryFlags::NONE;
        let mut value = MetaValue::empty();
        match (wire_type, value_bytes) {
            (Some(wire_type), Some(value_bytes)) => {
                if value_bytes > u64::from(options.limits.max_value_bytes) {
                    result.update(DecodeStatus::LimitExceeded);
                    flags |= EntryFlags::TRUNCATED;
                } else if value_bytes <= 4 {
                    let vref = classic::IfdValueRef {
                        value_off: raw.value_field_off,
                        value_bytes,
                        inline: true,
                    };
                    let (v, f) = classic::decode_tiff_value(
                        cfg,
                        note,
                        wire_type,
                        raw.count,
                        vref,
                        store.arena_mut(),
                        &options.limits,
                    );
                    value = v;
                    flags |= f;
                } else {
                    match resolve_fallback_window(ctx, note, base, raw.value_or_off, value_bytes, raw.wire_type)
                    {
                        Some(FallbackWindow::Note(off)) => {
                            let vref = classic::IfdValueRef { value_off: off, value_bytes, inline: false };
                            let (v, f) = classic::decode_tiff_value(
                                cfg,
                                note,
                                wire_type,
                                raw.count,
                                vref,
                                store.arena_mut(),
                                &options.limits,
                            );
                            value = v;
                            flags |= f;
                        }
                        Some(FallbackWindow::Outer(off)) => {
                            let vref = classic::IfdValueRef { value_off: off, value_bytes, inline: false };
                            let (v, f) = classic::decode_tiff_value(
                                cfg,
                                ctx.tiff,
                                wire_type,
                                raw.count,
                                vref,
                                store.arena_mut(),
                                &options.limits,
                            );
                            value = v;
                            flags |= f;
                        }
                        None => {
                            result.update(DecodeStatus::Malformed);
                            flags |= EntryFlags::UNREADABLE;
                        }
                    }
                }
            }
            _ => flags |= EntryFlags::UNREADABLE,
        }

        store.add_entry(Entry {
            key: MetaKey::ExifTag { ifd: token, tag: raw.tag },
            value,
            origin: EntryOrigin {
                block,
                order_in_block: i as u32,
                wire: WireType::tiff(raw.wire_type),
                wire_count: raw.count as u32,
            },
            flags,
        });
        result.entries_emitted += 1;
    }
}

enum FallbackWindow {
    /// Offset into the note window.
    Note(u64),
    /// Offset into the outer TIFF stream.
    Outer(u64),
}

/// Pick the base for an out-of-line value: note+`base`, note+0, or the
/// outer TIFF, scoring text-typed candidates for ASCII plausibility.
fn resolve_fallback_window(
    ctx: &NoteContext<'_>,
    note: &[u8],
    base: u64,
    off: u64,
    value_bytes: u64,
    wire_type: u16,
) -> Option<FallbackWindow> {
    let base_off = base.checked_add(off);
    let have_base = base_off.is_some_and(|o| o + value_bytes <= note.len() as u64);
    let have_zero = off + value_bytes <= note.len() as u64;
    let have_abs = off + value_bytes <= ctx.tiff.len() as u64;

    let is_text = wire_type == 2 || wire_type == 129;
    if is_text {
        let score_base = if have_base {
            score_ascii_blob(&note[base_off.unwrap_or(0) as usize..][..value_bytes as usize])
        } else {
            0
        };
        let score_zero = if have_zero {
            score_ascii_blob(&note[off as usize..][..value_bytes as usize])
        } else {
            0
        };
        let score_abs = if have_abs {
            score_ascii_blob(&ctx.tiff[off as usize..][..value_bytes as usize])
        } else {
            0
        };
        if score_base > 0 || score_zero > 0 || score_abs > 0 {
            if score_base >= score_zero && score_base >= score_abs && have_base {
                return Some(FallbackWindow::Note(base_off.unwrap_or(0)));
            }
            if score_zero >= score_abs && have_zero {
                return Some(FallbackWindow::Note(off));
            }
            if have_abs {
                return Some(FallbackWindow::Outer(off));
            }
        }
    }

    if have_base {
        return Some(FallbackWindow::Note(base_off.unwrap_or(0)));
    }
    if have_zero {
        return Some(FallbackWindow::Note(off));
    }
    if have_abs {
        return Some(FallbackWindow::Outer(off));
    }
    None
}

/// ASCII plausibility: printable bytes score high, a NUL terminator earns a
/// bonus, control bytes are penalised.
fn score_ascii_blob(raw: &[u8]) -> u32 {
    if raw.is_empty() {
        return 0;
    }
    let mut score = 0u32;
    let mut have_nul = false;
    for &b in raw.iter().take(64) {
        if b == 0 {
            have_nul = true;
            score += 2;
        } else if (0x20..=0x7E).contains(&b) {
            score += 3;
        } else {
            score = score.saturating_sub(1);
        }
    }
    if have_nul {
        score += 10;
    }
    score
}

fn decode_binary_subdirs(
    ctx: &NoteContext<'_>,
    mk: &MkTokens,
    store: &mut MetaStore,
    options: &ExifDecodeOptions,
    result: &mut ExifDecodeResult,
) {
    // ImageInfo: a u8 table unless it decoded as a SHORT scalar table.
    if let Some(raw) = util::entry_bytes_copy(store, &mk.ifd0, TAG_IMAGE_INFO) {
        util::emit_scalar_table(
            &mk.subtable("imageinfo", 0),
            &raw,
            TableElem::U8,
            ByteOrder::BigEndian,
            store,
            options,
            result,
        );
    }

    // Subdir: prefer the embedded `[Ricoh Camera Info]` marker in the note
    // body; fall back to the blob or pointer form of tag 0x2001.
    let note = ctx.note();
    let body = note.get(8..).unwrap_or(&[]);
    let mut have_subdir = false;
    if let Some(pos) = find_marker(body) {
        have_subdir = decode_subdir(ctx, &body[pos..], mk, store, options, result);
    }
    if !have_subdir {
        if let Some(raw) = util::entry_bytes_copy(store, &mk.ifd0, TAG_SUBDIR) {
            have_subdir = decode_subdir(ctx, &raw, mk, store, options, result);
        } else if let Some(ptr) = scalar_u32(store, &mk.ifd0, TAG_SUBDIR) {
            if u64::from(ptr) < ctx.tiff.len() as u64 {
                let window = ctx.tiff[ptr as usize..].to_vec();
                have_subdir = decode_subdir(ctx, &window, mk, store, options, result);
            }
        }
    }
    let _ = have_subdir;

    // ThetaSubdir behaves like a plain sub-IFD pointer into the outer TIFF.
    if let Some(ptr) = scalar_u32(store, &mk.ifd0, TAG_THETA_SUBDIR) {
        if u64::from(ptr) < ctx.tiff.len() as u64 {
            classic::decode_ifd_no_header(
                ctx.cfg,
                ctx.tiff,
                u64::from(ptr),
                &mk.subtable("thetasubdir", 0),
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

fn find_marker(body: &[u8]) -> Option<usize> {
    body.windows(SUBDIR_MARKER.len())
        .position(|w| w == SUBDIR_MARKER)
}

fn scalar_u32(store: &MetaStore, ifd: &str, tag: u16) -> Option<u32> {
    store
        .entries()
        .iter()
        .find(|e| match e.key {
            MetaKey::ExifTag { ifd: token, tag: t } => {
                t == tag && store.arena().span(token) == ifd.as_bytes()
            }
            _ => false,
        })
        .and_then(|e| {
            if e.value.kind == ValueKind::Scalar {
                e.value.as_u32()
            } else {
                None
            }
        })
}

/// `[Ricoh Camera Info]` block: 20-byte header, then a big-endian IFD whose
/// out-of-line values usually live in the outer TIFF stream.
fn decode_subdir(
    ctx: &NoteContext<'_>,
    raw: &[u8],
    mk: &MkTokens,
    store: &mut MetaStore,
    options: &ExifDecodeOptions,
    result: &mut ExifDecodeResult,
) -> bool {
    if raw.len() < 24 {
        return false;
    }
    let Some(marker_pos) = find_marker(raw) else {
        return false;
    };
    let hdr = marker_pos as u64 + 20;
    if hdr >= raw.len() as u64 {
        return false;
    }

    let cfg = TiffConfig::classic(ByteOrder::BigEndian);
    let Some(entry_count) = cfg.read_u16(raw, hdr) else {
        return false;
    };
    if entry_count == 0 || u32::from(entry_count) > options.limits.max_entries_per_ifd {
        return false;
    }
    let entries_off = hdr + 2;
    if entries_off + u64::from(entry_count) * 12 + 4 > raw.len() as u64 {
        return false;
    }

    let ifd_name = mk.subtable("subdir", 0);
    let Some(token) = store.arena_mut().intern(ifd_name.as_bytes()) else {
        return false;
    };
    let block = store.add_block(BlockInfo {
        token,
        parent: BlockId::INVALID,
        wire_offset: hdr,
        derived: false,
    });
    if !block.is_valid() {
        return false;
    }
    result.ifds_walked += 1;

    let mut added = false;
    for i in 0..u64::from(entry_count) {
        let entry_off = entries_off + i * 12;
        let Some(entry) = classic::read_ifd_entry(cfg, raw, entry_off) else {
            return added;
        };
        if !result.entry_budget_left(&options.limits) {
            result.update(DecodeStatus::LimitExceeded);
            return added;
        }

        let mut flags = EntryFlags::NONE;
        let mut value = MetaValue::empty();
        if let (Some(wire_type), Some(value_bytes)) =
            (TiffType::from_u16(entry.wire_type), classic::entry_value_bytes(&entry))
        {
            if value_bytes > u64::from(options.limits.max_value_bytes) {
                result.update(DecodeStatus::LimitExceeded);
                flags |= EntryFlags::TRUNCATED;
            } else if value_bytes <= 4 {
                let vref = classic::IfdValueRef {
                    value_off: entry.value_field_off,
                    value_bytes,
                    inline: true,
                };
                let (v, f) = classic::decode_tiff_value(
                    cfg,
                    raw,
                    wire_type,
                    entry.count,
                    vref,
                    store.arena_mut(),
                    &options.limits,
                );
                value = v;
                flags |= f;
            } else if entry.value_or_off + value_bytes <= ctx.tiff.len() as u64 {
                // Subdir values point into the outer TIFF stream.
                if entry.tag == TAG_FACE_INFO {
                    let face = ctx.tiff[entry.value_or_off as usize..][..value_bytes as usize].to_vec();
                    decode_face_info(&face, mk, store, options, result);
                }
                let vref = classic::IfdValueRef {
                    value_off: entry.value_or_off,
                    value_bytes,
                    inline: false,
                };
                let (v, f) = classic::decode_tiff_value(
                    cfg,
                    ctx.tiff,
                    wire_type,
                    entry.count,
                    vref,
                    store.arena_mut(),
                    &options.limits,
                );
                value = v;
                flags |= f;
            } else {
                // Fall back to block-relative offsets, disambiguated by
                // scoring when both fit.
                let off_a = (hdr - 20).checked_add(entry.value_or_off);
                let off_b = hdr.checked_add(entry.value_or_off);
                let ok_a = off_a.is_some_and(|o| o + value_bytes <= raw.len() as u64);
                let ok_b = off_b.is_some_and(|o| o + value_bytes <= raw.len() as u64);
                let chosen = match (ok_a, ok_b) {
                    (true, true) => {
                        let a = &raw[off_a.unwrap_or(0) as usize..][..value_bytes as usize];
                        let b = &raw[off_b.unwrap_or(0) as usize..][..value_bytes as usize];
                        let pick_b = if entry.wire_type == 2 || entry.wire_type == 129 {
                            score_ascii_blob(b) >= score_ascii_blob(a)
                        } else if entry.tag == TAG_FACE_INFO && entry.wire_type == 1 {
                            score_faceinfo_blob(b) >= score_faceinfo_blob(a)
                        } else {
                            true
                        };
                        Some(if pick_b { off_b.unwrap_or(0) } else { off_a.unwrap_or(0) })
                    }
                    (true, false) => off_a,
                    (false, true) => off_b,
                    (false, false) => None,
                };
                match chosen {
                    Some(off) => {
                        if entry.tag == TAG_FACE_INFO {
                            let face = raw[off as usize..][..value_bytes as usize].to_vec();
                            decode_face_info(&face, mk, store, options, result);
                        }
                        let vref = classic::IfdValueRef {
                            value_off: off,
                            value_bytes,
                            inline: false,
                        };
                        let (v, f) = classic::decode_tiff_value(
                            cfg,
                            raw,
                            wire_type,
                            entry.count,
                            vref,
                            store.arena_mut(),
                            &options.limits,
                        );
                        value = v;
                        flags |= f;
                    }
                    None => {
                        result.update(DecodeStatus::Malformed);
                        flags |= EntryFlags::UNREADABLE;
                    }
                }
            }
        } else {
            flags |= EntryFlags::UNREADABLE;
        }

        store.add_entry(Entry {
            key: MetaKey::ExifTag { ifd: token, tag: entry.tag },
            value,
            origin: EntryOrigin {
                block,
                order_in_block: i as u32,
                wire: WireType::tiff(entry.wire_type),
                wire_count: entry.count as u32,
            },
            flags,
        });
        result.entries_emitted += 1;
        added = true;
    }
    added
}

/// FaceInfo table: FacesDetected at 0xB5, frame size at 0xB6, then up to
/// eight 12-byte position boxes from 0xBC.
fn decode_face_info(
    raw: &[u8],
    mk: &MkTokens,
    store: &mut MetaStore,
    options: &ExifDecodeOptions,
    result: &mut ExifDecodeResult,
) {
    const BE: ByteOrder = ByteOrder::BigEndian;
    if raw.len() <= 0xB6 + 4 {
        return;
    }
    let faces = raw[0xB5];

    let mut list = TagListBuilder::new();
    list.push(0x00B5, MetaValue::u8(faces));
    list.push(0x00B6, util::u16_array(store.arena_mut(), raw, 0xB6, 2, BE));

    const FACE_TAGS: [u16; 8] = [0x00BC, 0x00C8, 0x00D4, 0x00E0, 0x00EC, 0x00F8, 0x0104, 0x0110];
    for (fi, &tag) in FACE_TAGS.iter().enumerate().take(usize::from(faces).min(8)) {
        let pos_off = 0xBC + fi as u64 * 0x0C;
        if pos_off + 8 > raw.len() as u64 {
            break;
        }
        list.push(tag, util::u16_array(store.arena_mut(), raw, pos_off, 4, BE));
    }
    list.emit(&mk.subtable("faceinfo", 0), store, options, result);
}

/// Plausibility score for a FaceInfo candidate window.
fn score_faceinfo_blob(raw: &[u8]) -> u32 {
    if raw.len() <= 0xB6 + 4 {
        return 0;
    }
    let faces = raw[0xB5];
    if faces > 8 {
        return 0;
    }
    let w = u16::from_be_bytes([raw[0xB6], raw[0xB7]]);
    let h = u16::from_be_bytes([raw[0xB8], raw[0xB9]]);

    let mut score = 100u32;
    if faces == 0 {
        score += 50;
    } else {
        score += 8 - u32::from(faces);
    }
    if w == 0 && h == 0 {
        score += 25;
    } else if w > 16 && h > 16 {
        score += 10;
    }
    if w <= 20000 && h <= 20000 {
        score += 5;
    }
    score
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ascii_scoring_prefers_text() {
        assert!(score_ascii_blob(b"RICOH GR III\0") > score_ascii_blob(&[0xFF, 0xFE, 0x01, 0x02]));
        assert_eq!(score_ascii_blob(&[]), 0);
    }

    #[test]
    fn ricoh_header_type2() {
        let mut note = b"RICOH\0\0\0".to_vec();
        note.extend_from_slice(&1u16.to_le_bytes()); // count at 8
        note.extend_from_slice(&[0, 0]); // pad
        note.extend_from_slice(&0x0005u16.to_le_bytes());
        note.extend_from_slice(&3u16.to_le_bytes());
        note.extend_from_slice(&1u32.to_le_bytes());
        note.extend_from_slice(&77u32.to_le_bytes());
        note.extend_from_slice(&0u32.to_le_bytes());

        let ctx = NoteContext {
            cfg: TiffConfig::classic(ByteOrder::LittleEndian),
            tiff: &note,
            note_off: 0,
            note_len: note.len() as u64,
            make: "RICOH".to_string(),
            model: "GR".to_string(),
        };
        let options = ExifDecodeOptions::default();
        let mk = MkTokens::new(&options, "ricoh");
        let mut store = MetaStore::new();
        let mut result = ExifDecodeResult::default();
        assert!(decode(&ctx, &mk, &mut store, &options, &mut result));
        let entry = store.entries()[0];
        assert_eq!(store.block_token(entry.origin.block), "mk_ricoh_type2_0");
        assert_eq!(entry.value.as_u32(), Some(77));
    }

    #[test]
    fn subdir_big_endian_ifd_in_outer_stream() {
        // Outer stream: note at 0 containing the marker block; subdir value
        // lives at an absolute outer offset.
        let mut note = b"Ricoh\0\0\0".to_vec();
        // No main IFD worth scoring; place the subdir right in the body.
        note.extend_from_slice(SUBDIR_MARKER);
        note.push(0); // NUL after marker (20 bytes total)
        // BE IFD: one SHORT inline.
        note.extend_from_slice(&1u16.to_be_bytes());
        note.extend_from_slice(&0x0002u16.to_be_bytes());
        note.extend_from_slice(&3u16.to_be_bytes());
        note.extend_from_slice(&1u32.to_be_bytes());
        note.extend_from_slice(&[0x12, 0x34, 0, 0]);
        note.extend_from_slice(&0u32.to_be_bytes());

        let ctx = NoteContext {
            cfg: TiffConfig::classic(ByteOrder::LittleEndian),
            tiff: &note,
            note_off: 0,
            note_len: note.len() as u64,
            make: "RICOH IMAGING COMPANY, LTD.".to_string(),
            model: "GR II".to_string(),
        };
        let options = ExifDecodeOptions::default();
        let mk = MkTokens::new(&options, "ricoh");
        let mut store = MetaStore::new();
        let mut result = ExifDecodeResult::default();
        decode(&ctx, &mk, &mut store, &options, &mut result);

        let subdir: Vec<_> = store
            .entries()
            .iter()
            .filter(|e| store.block_token(e.origin.block) == "mk_ricoh_subdir_0")
            .collect();
        assert_eq!(subdir.len(), 1);
        assert_eq!(subdir[0].value.as_u32(), Some(0x1234));
    }
}
