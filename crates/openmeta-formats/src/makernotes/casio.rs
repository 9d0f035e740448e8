//! Casio MakerNote decoder.
//!
//! `"QVC\0"` magic, then a big-endian directory whose entry count is a u32
//! (not the classic u16): count at +4, 12-byte entries at +8, offsets
//! relative to the note start. Face-info blobs (tag 0x2089) are recognised
//! by their leading bytes and re-emitted as u8 tables.

use openmeta_core::{
    BlockId, BlockInfo, ByteOrder, DecodeStatus, Entry, EntryFlags, EntryOrigin, MetaKey,
    MetaStore, TiffConfig, TiffType, WireType,
};

use super::util::{self, TableElem};
use super::{MkTokens, NoteContext};
use crate::exif::classic::{self, OffsetPolicy};
use crate::exif::{ExifDecodeOptions, ExifDecodeResult};

const TAG_FACE_INFO: u16 = 0x2089;

pub(crate) fn detect(ctx: &NoteContext<'_>) -> bool {
    ctx.note_starts(b"QVC\0")
}

pub(crate) fn decode(
    ctx: &NoteContext<'_>,
    mk: &MkTokens,
    store: &mut MetaStore,
    options: &ExifDecodeOptions,
    result: &mut ExifDecodeResult,
) -> bool {
    let note = ctx.note();
    if note.len() < 8 || !detect(ctx) {
        return false;
    }
    let cfg = TiffConfig::classic(ByteOrder::BigEndian);

    let Some(entry_count) = cfg.read_u32(note, 4) else {
        return false;
    };
    if entry_count == 0 || entry_count > options.limits.max_entries_per_ifd {
        result.update(DecodeStatus::LimitExceeded);
        return true;
    }
    let entries_off = 8u64;
    let table_bytes = u64::from(entry_count) * 12;
    if entries_off + table_bytes > note.len() as u64 {
        result.update(DecodeStatus::Malformed);
        return true;
    }

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
        let Some(raw) = classic::read_ifd_entry(cfg, note, entry_off) else {
            break;
        };
        let Some(wire_type) = TiffType::from_u16(raw.wire_type) else {
            result.update(DecodeStatus::Malformed);
            continue;
        };
        let Some(vref) = classic::resolve_value_ref(cfg, &raw, OffsetPolicy::absolute()) else {
            result.update(DecodeStatus::Malformed);
            continue;
        };
        if !result.entry_budget_left(&options.limits) {
            result.update(DecodeStatus::LimitExceeded);
            return true;
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
        } else if value_flags.contains(EntryFlags::TRUNCATED) {
            result.update(DecodeStatus::LimitExceeded);
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

    decode_face_info(mk, store, options, result);
    true
}

/// Face-info blobs are discriminated by their leading bytes.
fn decode_face_info(
    mk: &MkTokens,
    store: &mut MetaStore,
    options: &ExifDecodeOptions,
    result: &mut ExifDecodeResult,
) {
    let Some(raw) = util::entry_bytes_copy(store, &mk.ifd0, TAG_FACE_INFO) else {
        return;
    };
    let name = if is_faceinfo1(&raw) {
        mk.subtable("faceinfo1", 0)
    } else if is_faceinfo2(&raw) {
        mk.subtable("faceinfo2", 0)
    } else {
        return;
    };
    util::emit_scalar_table(
        &name,
        &raw,
        TableElem::U8,
        ByteOrder::BigEndian,
        store,
        options,
        result,
    );
}

fn is_faceinfo1(raw: &[u8]) -> bool {
    (raw.len() >= 2 && raw[0] == 0x00 && raw[1] == 0x00)
        || (raw.len() >= 5 && raw[1] == 0x02 && raw[2] == 0x80 && raw[3] == 0x01 && raw[4] == 0xE0)
}

fn is_faceinfo2(raw: &[u8]) -> bool {
    raw.len() >= 2 && raw[0] == 0x02 && raw[1] == 0x01
}
