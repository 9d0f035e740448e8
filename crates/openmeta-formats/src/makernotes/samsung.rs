//! Samsung MakerNote decoder.
//!
//! Two shapes:
//! - `"STMN"` magic: fixed main block (version string, preview offset and
//!   length), plus an optional SamsungIFD at +44 whose entry count is a
//!   u32 and whose out-of-line offsets are relative to the end of the IFD.
//! - Otherwise a classic little-endian IFD with no header ("type2");
//!   PictureWizard (tag 0x0021) is a fixed u16[5] table.

use openmeta_core::{
    BlockId, BlockInfo, ByteOrder, DecodeStatus, Entry, EntryFlags, EntryOrigin, MetaKey,
    MetaStore, MetaValue, TiffConfig, TiffType, WireType,
};

use super::util::{self, TagListBuilder};
use super::{MkTokens, NoteContext};
use crate::exif::classic::{self, make_fixed_ascii_text, OffsetPolicy};
use crate::exif::{ExifDecodeOptions, ExifDecodeResult};

const TAG_PICTURE_WIZARD: u16 = 0x0021;

pub(crate) fn detect(ctx: &NoteContext<'_>) -> bool {
    ctx.note_starts(b"STMN") || ctx.make_has("SAMSUNG")
}

pub(crate) fn decode(
    ctx: &NoteContext<'_>,
    mk: &MkTokens,
    store: &mut MetaStore,
    options: &ExifDecodeOptions,
    result: &mut ExifDecodeResult,
) -> bool {
    let note = ctx.note();

    if decode_stmn(ctx, note, mk, store, options, result) {
        return true;
    }

    // Type2: classic IFD at offset 0, trying both byte orders.
    let mut cfg = ctx.cfg;
    cfg.bigtiff = false;
    if !classic::looks_like_classic_ifd(cfg, note, 0, &options.limits) {
        cfg.byte_order = match cfg.byte_order {
            ByteOrder::LittleEndian => ByteOrder::BigEndian,
            ByteOrder::BigEndian => ByteOrder::LittleEndian,
        };
    }
    if !classic::looks_like_classic_ifd(cfg, note, 0, &options.limits) {
        return false;
    }

    let type2_name = mk.subtable("type2", 0);
    classic::decode_ifd_no_header(
        cfg,
        note,
        0,
        &type2_name,
        BlockId::INVALID,
        OffsetPolicy::absolute(),
        EntryFlags::NONE,
        store,
        options,
        result,
        |_, _| {},
    );
    decode_picture_wizard(&type2_name, mk, store, options, result);
    true
}

/// STMN fixed main block + optional SamsungIFD at +44.
fn decode_stmn(
    ctx: &NoteContext<'_>,
    note: &[u8],
    mk: &MkTokens,
    store: &mut MetaStore,
    options: &ExifDecodeOptions,
    result: &mut ExifDecodeResult,
) -> bool {
    const LE: ByteOrder = ByteOrder::LittleEndian;
    if note.len() < 16 || !ctx.note_starts(b"STMN") {
        return false;
    }

    let mut list = TagListBuilder::new();
    // 0x0000: MakerNoteVersion ("STMN012" style).
    list.push(0x0000, make_fixed_ascii_text(store.arena_mut(), &note[..8]));
    // 0x0002 / 0x0003: PreviewImageStart / PreviewImageLength.
    list.push(0x0002, util::u32_value(note, 8, LE));
    list.push(0x0003, util::u32_value(note, 12, LE));
    list.emit(&mk.ifd0, store, options, result);

    // Some models embed a SamsungIFD at +44: plausible when the u32 there
    // is small and non-zero.
    if note.len() >= 48 && note[44] != 0 && note[45] == 0 && note[46] == 0 && note[47] == 0 {
        decode_samsung_ifd(note, 44, &mk.subtable("ifd", 0), store, options, result);
    }
    true
}

/// SamsungIFD: u32 LE entry count, classic 12-byte entries, value offsets
/// relative to the byte just past the IFD's next-pointer.
fn decode_samsung_ifd(
    note: &[u8],
    ifd_off: u64,
    ifd_name: &str,
    store: &mut MetaStore,
    options: &ExifDecodeOptions,
    result: &mut ExifDecodeResult,
) {
    let cfg = TiffConfig::classic(ByteOrder::LittleEndian);
    let Some(entry_count) = cfg.read_u32(note, ifd_off) else {
        result.update(DecodeStatus::Malformed);
        return;
    };
    if entry_count == 0 {
        return;
    }
    if entry_count > options.limits.max_entries_per_ifd {
        result.update(DecodeStatus::LimitExceeded);
        return;
    }
    let entries_off = ifd_off + 4;
    let base = entries_off + u64::from(entry_count) * 12 + 4;
    if base > note.len() as u64 {
        result.update(DecodeStatus::Malformed);
        return;
    }
    let policy = OffsetPolicy::with_base(base as i64);

    let Some(token) = store.arena_mut().intern(ifd_name.as_bytes()) else {
        return;
    };
    let block = store.add_block(BlockInfo {
        token,
        parent: BlockId::INVALID,
        wire_offset: ifd_off,
        derived: false,
    });
    if !block.is_valid() {
        return;
    }
    result.ifds_walked += 1;

    for i in 0..u64::from(entry_count) {
        let entry_off = entries_off + i * 12;
        let Some(raw) = classic::read_ifd_entry(cfg, note, entry_off) else {
            result.update(DecodeStatus::Malformed);
            return;
        };
        let Some(wire_type) = TiffType::from_u16(raw.wire_type) else {
            continue;
        };
        let Some(vref) = classic::resolve_value_ref(cfg, &raw, policy) else {
            result.update(DecodeStatus::Malformed);
            continue;
        };
        if !result.entry_budget_left(&options.limits) {
            result.update(DecodeStatus::LimitExceeded);
            return;
        }
        let (value, value_flags) = classic::decode_tiff_value(
            cfg,
            note,
            wire_type,
            raw.count,
            vref,
            store.arena_mut(),
            &options.limits,
        );
        if value_flags.contains(EntryFlags::UNREADABLE) {
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
            flags: value_flags,
        });
        result.entries_emitted += 1;
    }
}

/// PictureWizard: u16[5] re-emitted as a fixed table (mode, colour,
/// saturation, sharpness, contrast).
fn decode_picture_wizard(
    type2_name: &str,
    mk: &MkTokens,
    store: &mut MetaStore,
    options: &ExifDecodeOptions,
    result: &mut ExifDecodeResult,
) {
    let Some(raw) = util::entry_bytes_copy(store, type2_name, TAG_PICTURE_WIZARD) else {
        return;
    };
    if raw.len() < 10 {
        return;
    }
    // Arrays were normalised to LE on first decode; raw blobs keep wire
    // order, which for type2 notes is little-endian as well.
    let mut list = TagListBuilder::new();
    for (j, tag) in (0x0000..0x0005u16).enumerate() {
        let off = (j * 2) as u64;
        list.push(tag, util::u16_value(&raw, off, ByteOrder::LittleEndian));
    }
    list.emit(&mk.subtable("picturewizard", 0), store, options, result);
}
