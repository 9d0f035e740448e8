//! Pentax MakerNote decoder.
//!
//! Three prefix variants: `"AOC\0"` (endianness pair at +4, IFD at +6),
//! `"PENTAX "` (scored IFD search after the 8-byte header) and raw (IFD at
//! offset 0). Most interesting payloads are flat u8 tables re-decoded in a
//! post-pass; AEInfo and LensInfo pick a variant by payload size, and
//! LensInfo nests a LensData slice.

use openmeta_core::{BlockId, ByteOrder, EntryFlags, MetaStore, TiffConfig};

use super::util::{self, TableElem};
use super::{MkTokens, NoteContext};
use crate::exif::classic::{self, OffsetPolicy};
use crate::exif::{ExifDecodeOptions, ExifDecodeResult};

pub(crate) fn detect(ctx: &NoteContext<'_>) -> bool {
    ctx.note_starts(b"AOC\0")
        || ctx.note_starts(b"PENTAX ")
        || ctx.make_has("PENTAX")
        || ctx.make_has("ASAHI")
}

pub(crate) fn decode(
    ctx: &NoteContext<'_>,
    mk: &MkTokens,
    store: &mut MetaStore,
    options: &ExifDecodeOptions,
    result: &mut ExifDecodeResult,
) -> bool {
    let note = ctx.note();
    if note.len() < 16 {
        return false;
    }

    if ctx.note_starts(b"AOC\0") {
        let Some(order) = aoc_byte_order(note) else {
            return false;
        };
        let cfg = TiffConfig::classic(order);
        // Entry count sits at +6, entries at +8, offsets note-relative.
        let outcome = classic::decode_ifd_no_header(
            cfg,
            note,
            6,
            &mk.ifd0,
            BlockId::INVALID,
            OffsetPolicy::absolute(),
            EntryFlags::NONE,
            store,
            options,
            result,
            |_, _| {},
        );
        if outcome.is_none() {
            return false;
        }
        decode_binary_subdirs(mk, store, options, result);
        return true;
    }

    if ctx.note_starts(b"PENTAX ") {
        let body = &note[8..];
        let Some(best) = classic::find_best_classic_ifd_candidate(body, 1024, &options.limits)
        else {
            return false;
        };
        let cfg = TiffConfig::classic(le_or_be(best.le));
        classic::decode_ifd_no_header(
            cfg,
            body,
            best.offset,
            &mk.ifd0,
            BlockId::INVALID,
            OffsetPolicy::absolute(),
            EntryFlags::NONE,
            store,
            options,
            result,
            |_, _| {},
        );
        decode_binary_subdirs(mk, store, options, result);
        return true;
    }

    // Raw variant: a headerless IFD, but never a full TIFF header (those
    // belong to other vendors).
    if note.len() >= 4
        && (note[..4] == *b"II\x2A\x00" || note[..4] == *b"MM\x00\x2A")
    {
        return false;
    }
    let mut cfg = TiffConfig::classic(ByteOrder::LittleEndian);
    if !classic::looks_like_classic_ifd(cfg, note, 0, &options.limits) {
        cfg.byte_order = ByteOrder::BigEndian;
        if !classic::looks_like_classic_ifd(cfg, note, 0, &options.limits) {
            return false;
        }
    }
    classic::decode_ifd_no_header(
        cfg,
        note,
        0,
        &mk.ifd0,
        BlockId::INVALID,
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

/// AOC header: the byte pair at +4 declares the IFD endianness.
fn aoc_byte_order(note: &[u8]) -> Option<ByteOrder> {
    Some(match (note[4], note[5]) {
        (0x49, 0x49) => ByteOrder::LittleEndian,
        (0x4D, 0x4D) => ByteOrder::BigEndian,
        (0x20, 0x20) => ByteOrder::BigEndian,
        (0x00, 0x00) => {
            // Probe the first entry's type word.
            if note.len() >= 10 && note[8] == 0x01 && note[9] == 0x00 {
                ByteOrder::LittleEndian
            } else {
                ByteOrder::BigEndian
            }
        }
        _ => ByteOrder::BigEndian,
    })
}

fn le_or_be(le: bool) -> ByteOrder {
    if le {
        ByteOrder::LittleEndian
    } else {
        ByteOrder::BigEndian
    }
}

/// Known u8-table payload tags; AEInfo/LensInfo/ShakeReduction pick their
/// variant name by payload size.
fn subtable_name(tag: u16, len: usize) -> Option<&'static str> {
    Some(match tag {
        0x003F => "lensrec",
        0x005C => {
            if len == 4 {
                "srinfo"
            } else {
                "srinfo2"
            }
        }
        0x0060 => "faceinfo",
        0x0068 => "awbinfo",
        0x006B => "timeinfo",
        0x007D => "lenscorr",
        0x0205 => "camerasettings",
        0x0206 => match len {
            21 => "aeinfo2",
            48 => "aeinfo3",
            1..=25 => "aeinfo",
            _ => return None,
        },
        0x0207 => match len {
            90 => "lensinfo3",
            91 => "lensinfo4",
            80 | 128 => "lensinfo5",
            168 => return None,
            _ => "lensinfo2",
        },
        0x0208 => {
            if len != 27 {
                return None;
            }
            "flashinfo"
        }
        0x0215 => "camerainfo",
        0x0216 => "batteryinfo",
        0x021F => "afinfo",
        0x0221 => "kelvinwb",
        0x0222 => "colorinfo",
        0x0224 => {
            if len > 200 {
                return None;
            }
            "evstepinfo"
        }
        0x0226 => "shotinfo",
        0x0227 => "facepos",
        0x0228 => "facesize",
        0x022A => "filterinfo",
        0x022B => "levelinfo",
        0x022D => {
            if len != 100 {
                return None;
            }
            "wblevels"
        }
        0x0239 => "lensinfoq",
        0x0243 => "pixelshiftinfo",
        0x0245 => "afpointinfo",
        0x03FF => "tempinfo",
        _ => return None,
    })
}

/// LensData slice within a LensInfo payload, per variant.
fn lensdata_slice(subtable: &str) -> Option<(usize, usize)> {
    match subtable {
        "lensinfo" => Some((3, 17)),
        "lensinfo2" => Some((4, 17)),
        "lensinfo3" => Some((13, 17)),
        "lensinfo4" => Some((12, 18)),
        "lensinfo5" => Some((15, 17)),
        _ => None,
    }
}

fn decode_binary_subdirs(
    mk: &MkTokens,
    store: &mut MetaStore,
    options: &ExifDecodeOptions,
    result: &mut ExifDecodeResult,
) {
    // Collect candidates first: emitting tables below grows the entry list
    // being iterated and the arena behind the payload spans.
    let tags: Vec<u16> = store
        .entries()
        .iter()
        .filter_map(|e| match e.key {
            openmeta_core::MetaKey::ExifTag { ifd, tag }
                if store.arena().span(ifd) == mk.ifd0.as_bytes() =>
            {
                Some(tag)
            }
            _ => None,
        })
        .collect();

    let mut index: std::collections::HashMap<&'static str, u32> = std::collections::HashMap::new();
    let mut lensdata_idx = 0u32;
    for tag in tags {
        let Some(raw) = util::entry_bytes_copy(store, &mk.ifd0, tag) else {
            continue;
        };
        let Some(subtable) = subtable_name(tag, raw.len()) else {
            continue;
        };
        let idx = index.entry(subtable).or_insert(0);
        let name = mk.subtable(subtable, *idx);
        *idx += 1;
        util::emit_scalar_table(
            &name,
            &raw,
            TableElem::U8,
            ByteOrder::BigEndian,
            store,
            options,
            result,
        );

        if tag == 0x0207 {
            if let Some((off, len)) = lensdata_slice(subtable) {
                if raw.len() >= off + len {
                    let name = mk.subtable("lensdata", lensdata_idx);
                    lensdata_idx += 1;
                    util::emit_scalar_table(
                        &name,
                        &raw[off..off + len],
                        TableElem::U8,
                        ByteOrder::BigEndian,
                        store,
                        options,
                        result,
                    );
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// AOC note, big-endian marker "MM": one CameraSettings u8 blob.
    fn aoc_note() -> Vec<u8> {
        let mut note = b"AOC\0MM".to_vec();
        note.extend_from_slice(&1u16.to_be_bytes()); // entry count at +6
        note.extend_from_slice(&0x0205u16.to_be_bytes());
        note.extend_from_slice(&7u16.to_be_bytes());
        note.extend_from_slice(&6u32.to_be_bytes());
        note.extend_from_slice(&24u32.to_be_bytes()); // note-relative offset
        note.extend_from_slice(&0u32.to_be_bytes()); // next IFD
        assert_eq!(note.len(), 24);
        note.extend_from_slice(&[9, 8, 7, 6, 5, 4]);
        note
    }

    #[test]
    fn aoc_camerasettings_as_u8_table() {
        let note = aoc_note();
        let ctx = NoteContext {
            cfg: TiffConfig::classic(ByteOrder::LittleEndian),
            tiff: &note,
            note_off: 0,
            note_len: note.len() as u64,
            make: "PENTAX Corporation".to_string(),
            model: "PENTAX K10D".to_string(),
        };
        let options = ExifDecodeOptions::default();
        let mk = MkTokens::new(&options, "pentax");
        let mut store = MetaStore::new();
        let mut result = ExifDecodeResult::default();
        assert!(decode(&ctx, &mk, &mut store, &options, &mut result));

        let table: Vec<_> = store
            .entries()
            .iter()
            .filter(|e| store.block_token(e.origin.block) == "mk_pentax_camerasettings_0")
            .collect();
        assert_eq!(table.len(), 6);
        assert_eq!(table[0].value.as_u64(), Some(9));
        assert_eq!(table[5].value.as_u64(), Some(4));
    }

    #[test]
    fn lensinfo_variant_by_size() {
        assert_eq!(subtable_name(0x0207, 90), Some("lensinfo3"));
        assert_eq!(subtable_name(0x0207, 91), Some("lensinfo4"));
        assert_eq!(subtable_name(0x0207, 128), Some("lensinfo5"));
        assert_eq!(subtable_name(0x0207, 168), None);
        assert_eq!(subtable_name(0x0207, 40), Some("lensinfo2"));
        assert_eq!(subtable_name(0x0206, 21), Some("aeinfo2"));
        assert_eq!(subtable_name(0x0206, 48), Some("aeinfo3"));
        assert_eq!(subtable_name(0x0206, 14), Some("aeinfo"));
        assert_eq!(subtable_name(0x0206, 26), None);
    }

    #[test]
    fn tiff_header_note_is_declined() {
        let note = b"II\x2A\x00\x08\x00\x00\x00________".to_vec();
        let ctx = NoteContext {
            cfg: TiffConfig::classic(ByteOrder::LittleEndian),
            tiff: &note,
            note_off: 0,
            note_len: note.len() as u64,
            make: "PENTAX".to_string(),
            model: String::new(),
        };
        let options = ExifDecodeOptions::default();
        let mk = MkTokens::new(&options, "pentax");
        let mut store = MetaStore::new();
        let mut result = ExifDecodeResult::default();
        assert!(!decode(&ctx, &mk, &mut store, &options, &mut result));
    }
}
