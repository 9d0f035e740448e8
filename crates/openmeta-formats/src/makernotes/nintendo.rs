//! Nintendo (3DS) MakerNote decoder.
//!
//! A classic IFD at the start of the note. Some files store out-of-line
//! value offsets relative to the outer TIFF stream, others relative to the
//! note itself; the decoder probes which policy keeps every out-of-line
//! value in bounds. CameraInfo (tag 0x1101) is a nested fixed-layout blob.

use openmeta_core::{ByteOrder, DecodeStatus, EntryFlags, MetaStore, TiffConfig};

use super::util::{self, TagListBuilder};
use super::{MkTokens, NoteContext};
use crate::exif::classic::{self, OffsetPolicy};
use crate::exif::{ExifDecodeOptions, ExifDecodeResult};

const TAG_CAMERA_INFO: u16 = 0x1101;
const LE: ByteOrder = ByteOrder::LittleEndian;

pub(crate) fn detect(ctx: &NoteContext<'_>) -> bool {
    ctx.make_has("NINTENDO")
}

pub(crate) fn decode(
    ctx: &NoteContext<'_>,
    mk: &MkTokens,
    store: &mut MetaStore,
    options: &ExifDecodeOptions,
    result: &mut ExifDecodeResult,
) -> bool {
    let note = ctx.note();

    // Try the outer byte order first, flipping once if the entry count is
    // implausible.
    let mut cfg = ctx.cfg;
    cfg.bigtiff = false;
    let mut found = false;
    for _ in 0..2 {
        match cfg.read_u16(note, 0) {
            Some(count)
                if count != 0 && u32::from(count) <= options.limits.max_entries_per_ifd =>
            {
                let table = 2 + u64::from(count) * 12 + 4;
                if table <= ctx.note_len {
                    found = true;
                    break;
                }
            }
            _ => {}
        }
        cfg.byte_order = flip(cfg.byte_order);
    }
    if !found {
        return false;
    }

    // Probe which offset policy keeps all out-of-line values in bounds.
    let entry_count = cfg.read_u16(note, 0).unwrap_or(0);
    let mut ok_rel = false;
    let mut ok_abs = false;
    for i in 0..u64::from(entry_count) {
        let entry_off = 2 + i * 12;
        let Some(raw) = classic::read_ifd_entry(cfg, note, entry_off) else {
            break;
        };
        let Some(value_bytes) = classic::entry_value_bytes(&raw) else {
            continue;
        };
        if raw.count == 0 || value_bytes <= 4 {
            continue;
        }
        if raw.value_or_off + value_bytes <= ctx.note_len {
            ok_rel = true;
        }
        if raw.value_or_off + value_bytes <= ctx.tiff.len() as u64 {
            ok_abs = true;
        }
        if raw.value_or_off >= ctx.note_len && ok_abs {
            ok_rel = false;
            break;
        }
    }

    if ok_abs && !ok_rel {
        classic::decode_ifd_no_header(
            cfg,
            ctx.tiff,
            ctx.note_off,
            &mk.ifd0,
            openmeta_core::BlockId::INVALID,
            OffsetPolicy::absolute(),
            EntryFlags::NONE,
            store,
            options,
            result,
            |_, _| {},
        );
    } else {
        classic::decode_ifd_no_header(
            cfg,
            note,
            0,
            &mk.ifd0,
            openmeta_core::BlockId::INVALID,
            OffsetPolicy::absolute(),
            EntryFlags::NONE,
            store,
            options,
            result,
            |_, _| {},
        );
    }

    decode_camera_info(mk, store, options, result);
    true
}

/// Nested CameraInfo blob: a few fixed fields, always little-endian.
fn decode_camera_info(
    mk: &MkTokens,
    store: &mut MetaStore,
    options: &ExifDecodeOptions,
    result: &mut ExifDecodeResult,
) {
    let Some(cam) = util::entry_bytes_copy(store, &mk.ifd0, TAG_CAMERA_INFO) else {
        return;
    };
    if cam.len() > 256 {
        result.update(DecodeStatus::LimitExceeded);
        return;
    }

    let ifd_name = mk.subtable("camerainfo", 0);
    let mut list = TagListBuilder::new();

    // 0x0000: ModelID (undef[4], typically ASCII like "3DS1").
    list.push(0x0000, util::ascii_text(store.arena_mut(), &cam, 0, 4));
    // 0x0008: TimeStamp.
    list.push(0x0008, util::u32_value(&cam, 0x0008, LE));
    // 0x0018: InternalSerialNumber.
    list.push(0x0018, util::bytes_value(store.arena_mut(), &cam, 0x0018, 4));
    // 0x0028: Parallax.
    list.push(0x0028, util::f32_value(&cam, 0x0028, LE));
    // 0x0030: Category.
    list.push(0x0030, util::u16_value(&cam, 0x0030, LE));

    list.emit(&ifd_name, store, options, result);
}

fn flip(order: ByteOrder) -> ByteOrder {
    match order {
        ByteOrder::LittleEndian => ByteOrder::BigEndian,
        ByteOrder::BigEndian => ByteOrder::LittleEndian,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Note-relative IFD: one UNDEFINED[52] CameraInfo entry at offset 18.
    fn nintendo_note() -> Vec<u8> {
        let mut note = 1u16.to_le_bytes().to_vec();
        note.extend_from_slice(&TAG_CAMERA_INFO.to_le_bytes());
        note.extend_from_slice(&7u16.to_le_bytes());
        note.extend_from_slice(&52u32.to_le_bytes());
        note.extend_from_slice(&18u32.to_le_bytes());
        note.extend_from_slice(&0u32.to_le_bytes());
        let mut cam = vec![0u8; 52];
        cam[..4].copy_from_slice(b"3DS1");
        cam[8..12].copy_from_slice(&0x5EADBEEFu32.to_le_bytes());
        cam[0x30..0x32].copy_from_slice(&2u16.to_le_bytes());
        note.extend_from_slice(&cam);
        note
    }

    #[test]
    fn decodes_nested_camera_info() {
        let note = nintendo_note();
        let ctx = NoteContext {
            cfg: TiffConfig::classic(LE),
            tiff: &note,
            note_off: 0,
            note_len: note.len() as u64,
            make: "Nintendo".to_string(),
            model: "Nintendo 3DS".to_string(),
        };
        let options = ExifDecodeOptions::default();
        let mk = MkTokens::new(&options, "nintendo");
        let mut store = MetaStore::new();
        let mut result = ExifDecodeResult::default();
        assert!(decode(&ctx, &mk, &mut store, &options, &mut result));

        let cam_entries: Vec<_> = store
            .entries()
            .iter()
            .filter(|e| store.block_token(e.origin.block) == "mk_nintendo_camerainfo_0")
            .collect();
        assert_eq!(cam_entries.len(), 5);
        assert_eq!(
            store.arena().span(cam_entries[0].value.span().unwrap()),
            b"3DS1"
        );
        assert_eq!(cam_entries[1].value.as_u32(), Some(0x5EADBEEF));
    }
}
