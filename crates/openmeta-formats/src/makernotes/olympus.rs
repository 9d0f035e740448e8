//! Olympus / OM Digital MakerNote decoder.
//!
//! Two wire shapes:
//! - Old (`"OLYMP\0"` / `"CAMER\0"`): 8-byte header, classic IFD after it,
//!   offsets relative to the outer TIFF stream.
//! - New (`"OLYMPUS\0"` + II/MM pair): classic IFD at +12, offsets relative
//!   to the MakerNote start. IFD-typed entries point at nested sub-IFDs
//!   (equipment, camerasettings, rawdevelopment(2), imageprocessing,
//!   focusinfo), and camerasettings itself nests aftargetinfo /
//!   subjectdetectinfo.

use openmeta_core::{BlockId, ByteOrder, EntryFlags, MetaStore, TiffConfig};

use super::{MkTokens, NoteContext};
use crate::exif::classic::{self, OffsetPolicy};
use crate::exif::{ExifDecodeOptions, ExifDecodeResult};

pub(crate) fn detect(ctx: &NoteContext<'_>) -> bool {
    ctx.note_starts(b"OLYMP\0")
        || ctx.note_starts(b"OLYMPUS\0")
        || ctx.note_starts(b"CAMER\0")
        || ctx.make_has("OLYMPUS")
        || ctx.make_has("OM DIGITAL")
}

fn main_subifd_table(tag: u16) -> Option<&'static str> {
    Some(match tag {
        0x2010 => "equipment",
        0x2020 => "camerasettings",
        0x2030 => "rawdevelopment",
        0x2031 => "rawdevelopment2",
        0x2040 => "imageprocessing",
        0x2050 => "focusinfo",
        _ => return None,
    })
}

pub(crate) fn decode(
    ctx: &NoteContext<'_>,
    mk: &MkTokens,
    store: &mut MetaStore,
    options: &ExifDecodeOptions,
    result: &mut ExifDecodeResult,
) -> bool {
    let note = ctx.note();
    if note.len() < 10 {
        return false;
    }

    // Old shape: header + IFD at +8, offsets into the outer TIFF.
    if ctx.note_starts(b"OLYMP\0") || ctx.note_starts(b"CAMER\0") {
        let ifd_off = ctx.note_off + 8;
        let mut cfg = ctx.cfg;
        cfg.bigtiff = false;
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
        return true;
    }

    // New shape: "OLYMPUS\0" + byte-order pair, IFD at +12, note-relative.
    if !ctx.note_starts(b"OLYMPUS\0") || note.len() < 16 {
        return false;
    }
    let cfg = match (note[8], note[9]) {
        (b'I', b'I') => TiffConfig::classic(ByteOrder::LittleEndian),
        (b'M', b'M') => TiffConfig::classic(ByteOrder::BigEndian),
        _ => return false,
    };
    let main_ifd_off = 12u64;
    if !classic::looks_like_classic_ifd(cfg, note, main_ifd_off, &options.limits) {
        return false;
    }

    decode_checked_ifd(cfg, note, main_ifd_off, &mk.ifd0, store, options, result);

    // Follow the known IFD-typed sub-directory pointers.
    let Some(entry_count) = cfg.read_u16(note, main_ifd_off) else {
        return true;
    };
    for i in 0..u64::from(entry_count) {
        let entry_off = main_ifd_off + 2 + i * 12;
        let Some(raw) = classic::read_ifd_entry(cfg, note, entry_off) else {
            break;
        };
        if raw.wire_type != 13 || raw.count != 1 {
            continue;
        }
        let Some(table) = main_subifd_table(raw.tag) else {
            continue;
        };
        let sub_ifd_off = raw.value_or_off;
        if sub_ifd_off >= note.len() as u64 {
            continue;
        }
        let token = mk.subtable(table, 0);
        decode_checked_ifd(cfg, note, sub_ifd_off, &token, store, options, result);

        if table == "camerasettings" {
            decode_camerasettings_nested(cfg, note, sub_ifd_off, mk, store, options, result);
        }
    }
    true
}

/// Decode an IFD only when it scores as plausible.
fn decode_checked_ifd(
    cfg: TiffConfig,
    bytes: &[u8],
    ifd_off: u64,
    token: &str,
    store: &mut MetaStore,
    options: &ExifDecodeOptions,
    result: &mut ExifDecodeResult,
) {
    if !classic::looks_like_classic_ifd(cfg, bytes, ifd_off, &options.limits) {
        return;
    }
    classic::decode_ifd_no_header(
        cfg,
        bytes,
        ifd_off,
        token,
        BlockId::INVALID,
        OffsetPolicy::absolute(),
        EntryFlags::NONE,
        store,
        options,
        result,
        |_, _| {},
    );
}

/// CameraSettings nests further IFD offsets: AFTargetInfo (0x030A) and
/// SubjectDetectInfo (0x030B). Only scalar LONG/IFD entries are followed.
fn decode_camerasettings_nested(
    cfg: TiffConfig,
    note: &[u8],
    ifd_off: u64,
    mk: &MkTokens,
    store: &mut MetaStore,
    options: &ExifDecodeOptions,
    result: &mut ExifDecodeResult,
) {
    let Some(entry_count) = cfg.read_u16(note, ifd_off) else {
        return;
    };
    for i in 0..u64::from(entry_count) {
        let entry_off = ifd_off + 2 + i * 12;
        let Some(raw) = classic::read_ifd_entry(cfg, note, entry_off) else {
            return;
        };
        if raw.count != 1 || (raw.wire_type != 4 && raw.wire_type != 13) {
            continue;
        }
        let subtable = match raw.tag {
            0x030A => "aftargetinfo",
            0x030B => "subjectdetectinfo",
            _ => continue,
        };
        let sub_off = raw.value_or_off;
        if sub_off >= note.len() as u64 {
            continue;
        }
        let token = mk.subtable(subtable, 0);
        decode_checked_ifd(cfg, note, sub_off, &token, store, options, result);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// New-style note: OLYMPUS header, LE IFD at +12 with an equipment
    /// sub-IFD (type 13) at a note-relative offset.
    fn olympus_new_note() -> Vec<u8> {
        let mut note = b"OLYMPUS\0II\x03\x00".to_vec();
        assert_eq!(note.len(), 12);
        // Main IFD: 1 entry.
        note.extend_from_slice(&1u16.to_le_bytes());
        note.extend_from_slice(&0x2010u16.to_le_bytes()); // equipment
        note.extend_from_slice(&13u16.to_le_bytes()); // IFD type
        note.extend_from_slice(&1u32.to_le_bytes());
        note.extend_from_slice(&30u32.to_le_bytes()); // note-relative
        note.extend_from_slice(&0u32.to_le_bytes());
        assert_eq!(note.len(), 30);
        // Equipment IFD: one SHORT.
        note.extend_from_slice(&1u16.to_le_bytes());
        note.extend_from_slice(&0x0100u16.to_le_bytes());
        note.extend_from_slice(&3u16.to_le_bytes());
        note.extend_from_slice(&1u32.to_le_bytes());
        note.extend_from_slice(&4242u32.to_le_bytes());
        note.extend_from_slice(&0u32.to_le_bytes());
        note
    }

    #[test]
    fn new_style_nested_equipment() {
        let note = olympus_new_note();
        let ctx = NoteContext {
            cfg: TiffConfig::classic(ByteOrder::BigEndian),
            tiff: &note,
            note_off: 0,
            note_len: note.len() as u64,
            make: "OLYMPUS CORPORATION".to_string(),
            model: "E-M1".to_string(),
        };
        let options = ExifDecodeOptions::default();
        let mk = MkTokens::new(&options, "olympus");
        let mut store = MetaStore::new();
        let mut result = ExifDecodeResult::default();
        assert!(decode(&ctx, &mk, &mut store, &options, &mut result));

        let equip: Vec<_> = store
            .entries()
            .iter()
            .filter(|e| store.block_token(e.origin.block) == "mk_olympus_equipment_0")
            .collect();
        assert_eq!(equip.len(), 1);
        assert_eq!(equip[0].value.as_u32(), Some(4242));
    }

    /// Old-style note inside an outer stream: offsets resolve against the
    /// outer TIFF, not the note.
    #[test]
    fn old_style_uses_outer_offsets() {
        // Outer stream: 4 pad bytes, then the note at offset 4.
        let mut tiff = vec![0u8; 4];
        let note_off = tiff.len() as u64;
        tiff.extend_from_slice(b"OLYMP\0\x02\x00");
        // IFD at note+8 (= stream 12): one ASCII[6] at stream offset 30.
        tiff.extend_from_slice(&1u16.to_le_bytes());
        tiff.extend_from_slice(&0x0207u16.to_le_bytes());
        tiff.extend_from_slice(&2u16.to_le_bytes());
        tiff.extend_from_slice(&6u32.to_le_bytes());
        tiff.extend_from_slice(&30u32.to_le_bytes()); // absolute in stream
        tiff.extend_from_slice(&0u32.to_le_bytes());
        assert_eq!(tiff.len(), 30);
        tiff.extend_from_slice(b"E-300\0");
        let note_len = tiff.len() as u64 - note_off;

        let ctx = NoteContext {
            cfg: TiffConfig::classic(ByteOrder::LittleEndian),
            tiff: &tiff,
            note_off,
            note_len,
            make: "OLYMPUS IMAGING CORP.".to_string(),
            model: "E-300".to_string(),
        };
        let options = ExifDecodeOptions::default();
        let mk = MkTokens::new(&options, "olympus");
        let mut store = MetaStore::new();
        let mut result = ExifDecodeResult::default();
        assert!(decode(&ctx, &mk, &mut store, &options, &mut result));

        let entry = store.entries()[0];
        assert_eq!(store.arena().span(entry.value.span().unwrap()), b"E-300");
    }
}
