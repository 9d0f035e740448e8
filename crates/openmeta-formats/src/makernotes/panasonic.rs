//! Panasonic / Leica MakerNote decoder.
//!
//! The main note is a classic IFD whose start drifts between models; it is
//! found by scoring candidates over the first 512 bytes (offsets absolute
//! in the outer TIFF). Post-passes reinterpret FaceDetInfo (0x004E),
//! FaceRecInfo (0x0061) and TimeInfo (0x2003, BCD date time). Type2 notes
//! are a small fixed-layout blob.

use openmeta_core::{ByteArena, ByteOrder, EntryFlags, MetaStore, MetaValue, TextEncoding, TiffConfig};

use super::util::{self, TagListBuilder};
use super::{MkTokens, NoteContext};
use crate::exif::classic::{self, make_fixed_ascii_text, ClassicIfdCandidate, OffsetPolicy};
use crate::exif::{ExifDecodeOptions, ExifDecodeResult};

const TAG_FACE_DET_INFO: u16 = 0x004E;
const TAG_FACE_REC_INFO: u16 = 0x0061;
const TAG_TIME_INFO: u16 = 0x2003;

pub(crate) fn detect(ctx: &NoteContext<'_>) -> bool {
    ctx.note_starts(b"Panasonic\0\0\0")
        || ctx.make_has("PANASONIC")
        || ctx.make_has("LEICA")
}

pub(crate) fn decode(
    ctx: &NoteContext<'_>,
    mk: &MkTokens,
    store: &mut MetaStore,
    options: &ExifDecodeOptions,
    result: &mut ExifDecodeResult,
) -> bool {
    let Some(best) = find_note_ifd(ctx, options) else {
        // No plausible IFD anywhere in the note: try the Type2 fixed blob.
        return decode_type2(ctx, mk, store, options, result);
    };

    let cfg = TiffConfig::classic(if best.le {
        ByteOrder::LittleEndian
    } else {
        ByteOrder::BigEndian
    });
    classic::decode_ifd_no_header(
        cfg,
        ctx.tiff,
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
    decode_binary_subdirs(mk, cfg.byte_order, store, options, result);
    true
}

/// Scored candidate search over the leading 512 note bytes, both
/// endiannesses, stepping by 2. Offsets are absolute in the outer TIFF.
///
/// Some real-world notes declare a byte count that truncates the trailing
/// next-IFD pointer, so only the entry table itself must fit.
fn find_note_ifd(ctx: &NoteContext<'_>, options: &ExifDecodeOptions) -> Option<ClassicIfdCandidate> {
    let scan_bytes = ctx.note_len.min(512);
    let scan_end = ctx.note_off + scan_bytes;
    let note_end = ctx.note_off + ctx.note_len;

    let mut best: Option<ClassicIfdCandidate> = None;
    let mut abs_off = ctx.note_off;
    while abs_off + 2 <= scan_end {
        for order in [ByteOrder::LittleEndian, ByteOrder::BigEndian] {
            let cfg = TiffConfig::classic(order);
            let Some(cand) =
                classic::score_classic_ifd_candidate(cfg, ctx.tiff, abs_off, &options.limits)
            else {
                continue;
            };
            let needed = 2 + u64::from(cand.entry_count) * 12;
            if abs_off + needed > note_end || cand.valid_entries == 0 {
                continue;
            }
            let better = match best {
                None => true,
                Some(b) => {
                    cand.valid_entries > b.valid_entries
                        || (cand.valid_entries == b.valid_entries && cand.offset < b.offset)
                }
            };
            if better {
                best = Some(cand);
            }
        }
        abs_off += 2;
    }
    best
}

/// Type2: a 4-char printable type string plus a gain word.
fn decode_type2(
    ctx: &NoteContext<'_>,
    mk: &MkTokens,
    store: &mut MetaStore,
    options: &ExifDecodeOptions,
    result: &mut ExifDecodeResult,
) -> bool {
    let note = ctx.note();
    if note.len() < 4 || !note[..4].iter().all(|&b| (0x20..=0x7E).contains(&b)) {
        return false;
    }
    let mut list = TagListBuilder::new();
    list.push(0x0000, make_fixed_ascii_text(store.arena_mut(), &note[..4]));
    list.push(0x0003, util::u16_value(note, 6, ctx.cfg.byte_order));
    list.emit(&mk.subtable("type2", 0), store, options, result)
}

fn decode_binary_subdirs(
    mk: &MkTokens,
    order: ByteOrder,
    store: &mut MetaStore,
    options: &ExifDecodeOptions,
    result: &mut ExifDecodeResult,
) {
    if let Some(raw) = util::entry_bytes_copy(store, &mk.ifd0, TAG_FACE_DET_INFO) {
        decode_face_det_info(&mk.subtable("facedetinfo", 0), &raw, order, store, options, result);
    }
    if let Some(raw) = util::entry_bytes_copy(store, &mk.ifd0, TAG_FACE_REC_INFO) {
        decode_face_rec_info(&mk.subtable("facerecinfo", 0), &raw, order, store, options, result);
    }
    if let Some(raw) = util::entry_bytes_copy(store, &mk.ifd0, TAG_TIME_INFO) {
        decode_time_info(&mk.subtable("timeinfo", 0), &raw, order, store, options, result);
    }
}

/// FaceDetInfo: face count word, then up to five (x, y, w, h) quads at
/// word-indexed tags 0x01/0x05/0x09/0x0D/0x11.
fn decode_face_det_info(
    ifd_name: &str,
    raw: &[u8],
    order: ByteOrder,
    store: &mut MetaStore,
    options: &ExifDecodeOptions,
    result: &mut ExifDecodeResult,
) {
    let Some(faces) = openmeta_core::reader::read_u16(raw, 0, order) else {
        return;
    };
    let mut list = TagListBuilder::new();
    list.push(0x0000, MetaValue::u16(faces));

    const FACE_TAGS: [u16; 5] = [0x0001, 0x0005, 0x0009, 0x000D, 0x0011];
    for &tag in FACE_TAGS.iter().take(usize::from(faces).min(5)) {
        let byte_off = u64::from(tag) * 2;
        list.push(tag, read_u16_quad(store.arena_mut(), raw, byte_off, order));
    }
    list.emit(ifd_name, store, options, result);
}

/// FaceRecInfo: face count, then per face a name[20], position quad and
/// age[20] at 48-byte stride; tag ids are the byte offsets.
fn decode_face_rec_info(
    ifd_name: &str,
    raw: &[u8],
    order: ByteOrder,
    store: &mut MetaStore,
    options: &ExifDecodeOptions,
    result: &mut ExifDecodeResult,
) {
    let Some(faces) = openmeta_core::reader::read_u16(raw, 0, order) else {
        return;
    };
    let mut list = TagListBuilder::new();
    list.push(0x0000, MetaValue::u16(faces));

    for i in 0..u64::from(faces).min(3) {
        let name_off = 4 + i * 48;
        let pos_off = 24 + i * 48;
        let age_off = 32 + i * 48;
        if name_off + 20 <= raw.len() as u64 {
            list.push(
                name_off as u16,
                util::ascii_text(store.arena_mut(), raw, name_off, 20),
            );
        }
        list.push(pos_off as u16, read_u16_quad(store.arena_mut(), raw, pos_off, order));
        if age_off + 20 <= raw.len() as u64 {
            list.push(
                age_off as u16,
                util::ascii_text(store.arena_mut(), raw, age_off, 20),
            );
        }
    }
    list.emit(ifd_name, store, options, result);
}

/// TimeInfo: 8 BCD bytes of date time plus a shot counter.
fn decode_time_info(
    ifd_name: &str,
    raw: &[u8],
    order: ByteOrder,
    store: &mut MetaStore,
    options: &ExifDecodeOptions,
    result: &mut ExifDecodeResult,
) {
    let mut list = TagListBuilder::new();
    list.push(0x0000, bcd_datetime(store.arena_mut(), raw));
    if raw.len() >= 20 {
        list.push(0x0010, util::u32_value(raw, 16, order));
    }
    list.emit(ifd_name, store, options, result);
}

/// Format 8 BCD bytes as `YYYY:MM:DD HH:MM:SS.xx`; falls back to the raw
/// bytes when a nibble is not a decimal digit.
fn bcd_datetime(arena: &mut ByteArena, raw: &[u8]) -> MetaValue {
    if raw.len() < 8 || raw[0] == 0 {
        return MetaValue::empty();
    }
    let mut digits = [0u8; 16];
    for (i, &b) in raw[..8].iter().enumerate() {
        let hi = (b >> 4) & 0x0F;
        let lo = b & 0x0F;
        if hi > 9 || lo > 9 {
            return util::bytes_value(arena, raw, 0, 8);
        }
        digits[i * 2] = b'0' + hi;
        digits[i * 2 + 1] = b'0' + lo;
    }
    let d = &digits;
    let text = format!(
        "{}{}{}{}:{}{}:{}{} {}{}:{}{}:{}{}.{}{}",
        d[0] as char, d[1] as char, d[2] as char, d[3] as char,
        d[4] as char, d[5] as char,
        d[6] as char, d[7] as char,
        d[8] as char, d[9] as char,
        d[10] as char, d[11] as char,
        d[12] as char, d[13] as char,
        d[14] as char, d[15] as char,
    );
    match arena.intern(text.as_bytes()) {
        Some(span) => MetaValue::text(span, TextEncoding::Ascii),
        None => MetaValue::empty(),
    }
}

/// (x, y, w, h) quad as a u16[4] array value.
fn read_u16_quad(arena: &mut ByteArena, raw: &[u8], off: u64, order: ByteOrder) -> MetaValue {
    if openmeta_core::reader::window(raw, off, 8).is_none() {
        return MetaValue::empty();
    }
    util::u16_array(arena, raw, off, 4, order)
}

#[cfg(test)]
mod tests {
    use super::*;
    use openmeta_core::ValueKind;

    #[test]
    fn bcd_time_formats() {
        let mut arena = ByteArena::new();
        let raw = [0x20, 0x24, 0x03, 0x27, 0x10, 0x01, 0x22, 0x55];
        let v = bcd_datetime(&mut arena, &raw);
        assert_eq!(v.kind, ValueKind::Text);
        assert_eq!(
            arena.span(v.span().unwrap()),
            b"2024:03:27 10:01:22.55"
        );
    }

    #[test]
    fn bad_bcd_falls_back_to_bytes() {
        let mut arena = ByteArena::new();
        let raw = [0xAB, 0x24, 0x03, 0x27, 0x10, 0x01, 0x22, 0x55];
        let v = bcd_datetime(&mut arena, &raw);
        assert_eq!(v.kind, ValueKind::Bytes);
    }

    /// Note with IFD at +12 (after a "Panasonic\0\0\0" header) holding one
    /// TimeInfo blob.
    #[test]
    fn header_ifd_and_timeinfo() {
        let mut note = b"Panasonic\0\0\0".to_vec();
        note.extend_from_slice(&1u16.to_le_bytes());
        note.extend_from_slice(&TAG_TIME_INFO.to_le_bytes());
        note.extend_from_slice(&7u16.to_le_bytes());
        note.extend_from_slice(&20u32.to_le_bytes());
        note.extend_from_slice(&30u32.to_le_bytes()); // absolute offset
        note.extend_from_slice(&0u32.to_le_bytes());
        let mut blob = vec![0u8; 20];
        blob[..8].copy_from_slice(&[0x20, 0x24, 0x01, 0x02, 0x03, 0x04, 0x05, 0x06]);
        blob[16..20].copy_from_slice(&777u32.to_le_bytes());
        note.extend_from_slice(&blob);

        let ctx = NoteContext {
            cfg: TiffConfig::classic(ByteOrder::LittleEndian),
            tiff: &note,
            note_off: 0,
            note_len: note.len() as u64,
            make: "Panasonic".to_string(),
            model: "DMC-GH5".to_string(),
        };
        let options = ExifDecodeOptions::default();
        let mk = MkTokens::new(&options, "panasonic");
        let mut store = MetaStore::new();
        let mut result = ExifDecodeResult::default();
        assert!(decode(&ctx, &mk, &mut store, &options, &mut result));

        let time: Vec<_> = store
            .entries()
            .iter()
            .filter(|e| store.block_token(e.origin.block) == "mk_panasonic_timeinfo_0")
            .collect();
        assert_eq!(time.len(), 2);
        assert_eq!(time[1].value.as_u32(), Some(777));
    }
}
