//! HP MakerNote decoder.
//!
//! `"IIII"` magic plus a kind byte: 0x04/0x05 are Type4, 0x06 is Type6.
//! Both are fixed-layout binary blobs where the tag id doubles as the byte
//! offset. Only a handful of fields are populated.

use openmeta_core::{ByteOrder, DecodeStatus, MetaStore};

use super::util::{self, TagListBuilder};
use super::{MkTokens, NoteContext};
use crate::exif::classic::make_fixed_ascii_text;
use crate::exif::{ExifDecodeOptions, ExifDecodeResult};

const LE: ByteOrder = ByteOrder::LittleEndian;
const SERIAL_PREFIX: &[u8] = b"SERIAL NUMBER:";

pub(crate) fn detect(ctx: &NoteContext<'_>) -> bool {
    let note = ctx.note();
    note.len() >= 6
        && ctx.note_starts(b"IIII")
        && note[5] == 0
        && matches!(note[4], 0x04 | 0x05 | 0x06)
}

pub(crate) fn decode(
    ctx: &NoteContext<'_>,
    mk: &MkTokens,
    store: &mut MetaStore,
    options: &ExifDecodeOptions,
    result: &mut ExifDecodeResult,
) -> bool {
    let note = ctx.note();
    if !detect(ctx) {
        return false;
    }
    let is_type6 = note[4] == 0x06;
    let subtable = if is_type6 { "type6" } else { "type4" };
    let ifd_name = mk.subtable(subtable, 0);

    let mut list = TagListBuilder::new();

    // 0x000c: Type6 FNumber, Type4 MaxAperture; both int16u scaled by 10.
    if let Some(v) = openmeta_core::reader::read_u16(note, 0x000C, LE) {
        list.push(0x000C, util::make_urational(store.arena_mut(), u32::from(v), 10));
    }
    // 0x0010: ExposureTime in microseconds.
    if let Some(us) = openmeta_core::reader::read_u32(note, 0x0010, LE) {
        list.push(0x0010, util::make_urational(store.arena_mut(), us, 1_000_000));
    }
    // 0x0014: CameraDateTime (string[20]).
    list.push(0x0014, util::ascii_text(store.arena_mut(), note, 0x0014, 20));
    // 0x0034: ISO.
    list.push(0x0034, util::u16_value(note, 0x0034, LE));
    // 0x0058 (Type6) / 0x005c (Type4): SerialNumber with an optional
    // "SERIAL NUMBER:" prefix to strip.
    let serial_off: u64 = if is_type6 { 0x0058 } else { 0x005C };
    let serial = read_hp_serial(store, note, serial_off);
    list.push(serial_off as u16, serial);

    if list.is_empty() {
        result.update(DecodeStatus::Malformed);
        return false;
    }
    list.emit(&ifd_name, store, options, result)
}

/// string[26], NUL-terminated early, prefix-stripped, whitespace-trimmed.
fn read_hp_serial(store: &mut MetaStore, note: &[u8], off: u64) -> openmeta_core::MetaValue {
    const LEN: u64 = 26;
    let Some(raw) = openmeta_core::reader::window(note, off, LEN) else {
        return openmeta_core::MetaValue::empty();
    };
    let end = raw.iter().position(|&b| b == 0).unwrap_or(raw.len());
    let mut text = &raw[..end];
    text = trim_ascii_ws(text);
    if text.starts_with(SERIAL_PREFIX) {
        text = trim_ascii_ws(&text[SERIAL_PREFIX.len()..]);
    }
    if text.is_empty() {
        return openmeta_core::MetaValue::empty();
    }
    make_fixed_ascii_text(store.arena_mut(), text)
}

fn trim_ascii_ws(mut s: &[u8]) -> &[u8] {
    while let [b' ' | b'\t' | b'\r' | b'\n' | 0, rest @ ..] = s {
        s = rest;
    }
    while let [rest @ .., b' ' | b'\t' | b'\r' | b'\n' | 0] = s {
        s = rest;
    }
    s
}

#[cfg(test)]
mod tests {
    use super::*;
    use openmeta_core::{MetaKey, TiffConfig, ValueKind};

    fn hp_note(kind: u8) -> Vec<u8> {
        let mut note = b"IIII".to_vec();
        note.push(kind);
        note.push(0);
        note.resize(0x80, 0);
        note[0x0C..0x0E].copy_from_slice(&28u16.to_le_bytes()); // f/2.8
        note[0x10..0x14].copy_from_slice(&10_000u32.to_le_bytes()); // 1/100 s
        note[0x14..0x14 + 19].copy_from_slice(b"2004:03:27 10:01:22");
        note[0x34..0x36].copy_from_slice(&100u16.to_le_bytes());
        note[0x58..0x58 + 20].copy_from_slice(b"SERIAL NUMBER:CN4407");
        note
    }

    fn run(note: &[u8]) -> (MetaStore, ExifDecodeResult) {
        let ctx = NoteContext {
            cfg: TiffConfig::classic(ByteOrder::LittleEndian),
            tiff: note,
            note_off: 0,
            note_len: note.len() as u64,
            make: "Hewlett-Packard".to_string(),
            model: "HP PhotoSmart R707".to_string(),
        };
        let options = ExifDecodeOptions::default();
        let mk = MkTokens::new(&options, "hp");
        let mut store = MetaStore::new();
        let mut result = ExifDecodeResult::default();
        assert!(decode(&ctx, &mk, &mut store, &options, &mut result));
        (store, result)
    }

    #[test]
    fn type6_fields() {
        let note = hp_note(0x06);
        let (store, result) = run(&note);
        assert_eq!(result.entries_emitted, 5);
        assert_eq!(store.block_token(store.entries()[0].origin.block), "mk_hp_type6_0");

        // Serial prefix is stripped.
        let serial = store
            .entries()
            .iter()
            .find(|e| e.key.exif_tag() == Some(0x58))
            .unwrap();
        assert_eq!(serial.value.kind, ValueKind::Text);
        assert_eq!(store.arena().span(serial.value.span().unwrap()), b"CN4407");
    }

    #[test]
    fn type4_uses_its_serial_offset() {
        let mut note = hp_note(0x04);
        note[0x58..0x58 + 20].copy_from_slice(&[0u8; 20]);
        note[0x5C..0x5C + 6].copy_from_slice(b"X1234\x00");
        let (store, _) = run(&note);
        let serial = store
            .entries()
            .iter()
            .find(|e| matches!(e.key, MetaKey::ExifTag { tag: 0x5C, .. }))
            .unwrap();
        assert_eq!(store.arena().span(serial.value.span().unwrap()), b"X1234");
    }

    #[test]
    fn wrong_magic_declines() {
        let ctx = NoteContext {
            cfg: TiffConfig::classic(ByteOrder::LittleEndian),
            tiff: b"XXXX\x06\x00",
            note_off: 0,
            note_len: 6,
            make: String::new(),
            model: String::new(),
        };
        assert!(!detect(&ctx));
    }
}
