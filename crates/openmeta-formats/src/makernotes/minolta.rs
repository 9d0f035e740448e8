//! Minolta / Konica-Minolta MakerNote decoder.
//!
//! The main note is a classic IFD found by scored search (some bodies put
//! junk before it). The interesting payloads are flat big-endian tables
//! re-decoded in a post-pass:
//! - 0x0001 / 0x0003 CameraSettings: int32u BE
//! - 0x0004 CameraSettings7D: int16u BE
//! - 0x0114 CameraSettings5D: int16u BE

use openmeta_core::{ByteOrder, EntryFlags, MetaStore, TiffConfig};

use super::util::{self, TableElem};
use super::{MkTokens, NoteContext};
use crate::exif::classic::{self, OffsetPolicy};
use crate::exif::{ExifDecodeOptions, ExifDecodeResult};

pub(crate) fn detect(ctx: &NoteContext<'_>) -> bool {
    ctx.make_has("MINOLTA") || ctx.make_has("KONICA")
}

pub(crate) fn decode(
    ctx: &NoteContext<'_>,
    mk: &MkTokens,
    store: &mut MetaStore,
    options: &ExifDecodeOptions,
    result: &mut ExifDecodeResult,
) -> bool {
    let note = ctx.note();

    let Some(best) = classic::find_best_classic_ifd_candidate(note, 256, &options.limits) else {
        return false;
    };
    let cfg = TiffConfig::classic(if best.le {
        ByteOrder::LittleEndian
    } else {
        ByteOrder::BigEndian
    });
    classic::decode_ifd_no_header(
        cfg,
        note,
        best.offset,
        &mk.ifd0,
        openmeta_core::BlockId::INVALID,
        OffsetPolicy::absolute(),
        EntryFlags::NONE,
        store,
        options,
        result,
        |_, _| {},
    );

    decode_binary_subdirs(mk, store, options, result);
    true
}

/// Reinterpret the known camera-settings payloads as BE scalar tables.
///
/// The source bytes live in the arena; each table is copied out before any
/// derived entry is appended (arena growth invalidates raw references).
fn decode_binary_subdirs(
    mk: &MkTokens,
    store: &mut MetaStore,
    options: &ExifDecodeOptions,
    result: &mut ExifDecodeResult,
) {
    const BE: ByteOrder = ByteOrder::BigEndian;

    let mut settings_idx = 0u32;
    for tag in [0x0001u16, 0x0003] {
        if let Some(raw) = util::entry_bytes_copy(store, &mk.ifd0, tag) {
            let name = mk.subtable("camerasettings", settings_idx);
            settings_idx += 1;
            util::emit_scalar_table(&name, &raw, TableElem::U32, BE, store, options, result);
        }
    }
    if let Some(raw) = util::entry_bytes_copy(store, &mk.ifd0, 0x0004) {
        let name = mk.subtable("camerasettings7d", 0);
        util::emit_scalar_table(&name, &raw, TableElem::U16, BE, store, options, result);
    }
    if let Some(raw) = util::entry_bytes_copy(store, &mk.ifd0, 0x0114) {
        let name = mk.subtable("camerasettings5d", 0);
        util::emit_scalar_table(&name, &raw, TableElem::U16, BE, store, options, result);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// LE classic IFD with one UNDEFINED[8] CameraSettings entry at 18.
    fn minolta_note() -> Vec<u8> {
        let mut note = 1u16.to_le_bytes().to_vec();
        note.extend_from_slice(&0x0001u16.to_le_bytes());
        note.extend_from_slice(&7u16.to_le_bytes());
        note.extend_from_slice(&8u32.to_le_bytes());
        note.extend_from_slice(&18u32.to_le_bytes());
        note.extend_from_slice(&0u32.to_le_bytes());
        // Two big-endian u32 values: 2 (exposure mode), 5.
        note.extend_from_slice(&2u32.to_be_bytes());
        note.extend_from_slice(&5u32.to_be_bytes());
        note
    }

    #[test]
    fn camera_settings_decoded_as_be_u32_table() {
        let note = minolta_note();
        let ctx = NoteContext {
            cfg: TiffConfig::classic(ByteOrder::LittleEndian),
            tiff: &note,
            note_off: 0,
            note_len: note.len() as u64,
            make: "MINOLTA CO.,LTD".to_string(),
            model: "DiMAGE 7".to_string(),
        };
        let options = ExifDecodeOptions::default();
        let mk = MkTokens::new(&options, "minolta");
        let mut store = MetaStore::new();
        let mut result = ExifDecodeResult::default();
        assert!(decode(&ctx, &mk, &mut store, &options, &mut result));

        let table: Vec<_> = store
            .entries()
            .iter()
            .filter(|e| store.block_token(e.origin.block) == "mk_minolta_camerasettings_0")
            .collect();
        assert_eq!(table.len(), 2);
        assert_eq!(table[0].key.exif_tag(), Some(0));
        assert_eq!(table[0].value.as_u32(), Some(2));
        assert_eq!(table[1].value.as_u32(), Some(5));
        assert!(table[0].flags.contains(EntryFlags::DERIVED));
    }
}
