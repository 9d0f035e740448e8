//! Sony MakerNote decoder.
//!
//! The main note is either a headerless classic IFD with absolute offsets
//! (ARW), a `"VHAB"`-prefixed IFD at +12 (Hasselblad-branded bodies), or a
//! `"SONY"`-prefixed block whose IFD start is found by scored search.
//!
//! The interesting subdirectories (Tag9xxx, Tag2010x) are protected by a
//! byte-wise substitution cipher: encipher is `c = b^3 mod 249`, so
//! decipher is the modular cube root `b = c^55 mod 249` (bytes >= 249 pass
//! through). Some bodies apply the cipher twice; the round count is chosen
//! by which one yields plausible version bytes.

use openmeta_core::{
    BlockId, ByteArena, ByteOrder, EntryFlags, MetaStore, MetaValue, TiffConfig,
};

use super::util::{self, TagListBuilder};
use super::{MkTokens, NoteContext};
use crate::exif::classic::{self, ClassicIfdCandidate, OffsetPolicy};
use crate::exif::{ExifDecodeOptions, ExifDecodeResult};

/// Decipher LUT: inverse of `c = b^3 mod 249` over bytes below 249.
const DECIPHER: [u8; 249] = make_decipher_lut();

const fn mod_pow_249(base: u32, mut exp: u32) -> u32 {
    let mut result = 1u32;
    let mut cur = base % 249;
    while exp != 0 {
        if exp & 1 != 0 {
            result = (result * cur) % 249;
        }
        cur = (cur * cur) % 249;
        exp >>= 1;
    }
    result
}

const fn make_decipher_lut() -> [u8; 249] {
    let mut lut = [0u8; 249];
    let mut c = 0usize;
    while c < 249 {
        lut[c] = mod_pow_249(c as u32, 55) as u8;
        c += 1;
    }
    lut
}

#[inline]
fn decipher(b: u8, rounds: u32) -> u8 {
    let mut out = b;
    let mut i = 0;
    while i < rounds {
        if out < 249 {
            out = DECIPHER[out as usize];
        }
        i += 1;
    }
    out
}

fn read_u8(bytes: &[u8], off: u64, rounds: u32) -> Option<u8> {
    bytes.get(usize::try_from(off).ok()?).map(|&b| decipher(b, rounds))
}

fn read_u16le(bytes: &[u8], off: u64, rounds: u32) -> Option<u16> {
    let b0 = read_u8(bytes, off, rounds)?;
    let b1 = read_u8(bytes, off + 1, rounds)?;
    Some(u16::from_le_bytes([b0, b1]))
}

fn read_i16le(bytes: &[u8], off: u64, rounds: u32) -> Option<i16> {
    read_u16le(bytes, off, rounds).map(|v| v as i16)
}

fn read_u32le(bytes: &[u8], off: u64, rounds: u32) -> Option<u32> {
    let b0 = read_u8(bytes, off, rounds)?;
    let b1 = read_u8(bytes, off + 1, rounds)?;
    let b2 = read_u8(bytes, off + 2, rounds)?;
    let b3 = read_u8(bytes, off + 3, rounds)?;
    Some(u32::from_le_bytes([b0, b1, b2, b3]))
}

fn deciphered_bytes(
    arena: &mut ByteArena,
    bytes: &[u8],
    off: u64,
    len: u32,
    rounds: u32,
) -> MetaValue {
    let Some(span) = arena.allocate(len, 1) else {
        return MetaValue::empty();
    };
    for i in 0..u64::from(len) {
        let Some(b) = read_u8(bytes, off + i, rounds) else {
            return MetaValue::empty();
        };
        arena.span_mut(span)[i as usize] = b;
    }
    MetaValue::bytes(span)
}

/// Pick 1 or 2 cipher rounds by which one yields an allowed version byte.
fn guess_rounds(bytes: &[u8], off: u64, allowed: &[u8]) -> u32 {
    for rounds in [1u32, 2] {
        match read_u8(bytes, off, rounds) {
            Some(b) if allowed.contains(&b) => return rounds,
            Some(_) => {}
            None => return 1,
        }
    }
    1
}

/// One fixed field in a ciphered blob; the tag id is the byte offset.
#[derive(Clone, Copy)]
enum FieldKind {
    U8,
    U16Le,
    U32Le,
    I16Le,
    U8Array(u16),
    U16LeArray(u16),
    I16LeArray(u16),
    Bytes(u16),
}

struct CipherField {
    tag: u16,
    kind: FieldKind,
}

const fn f(tag: u16, kind: FieldKind) -> CipherField {
    CipherField { tag, kind }
}

fn decode_cipher_fields(
    bytes: &[u8],
    ifd_name: &str,
    rounds: u32,
    fields: &[CipherField],
    store: &mut MetaStore,
    options: &ExifDecodeOptions,
    result: &mut ExifDecodeResult,
) {
    if bytes.is_empty() {
        return;
    }
    let mut list = TagListBuilder::new();
    for field in fields {
        let off = u64::from(field.tag);
        let value = match field.kind {
            FieldKind::U8 => read_u8(bytes, off, rounds).map(MetaValue::u8),
            FieldKind::U16Le => read_u16le(bytes, off, rounds).map(MetaValue::u16),
            FieldKind::U32Le => read_u32le(bytes, off, rounds).map(MetaValue::u32),
            FieldKind::I16Le => read_i16le(bytes, off, rounds).map(MetaValue::i16),
            FieldKind::U8Array(n) => {
                let mut tmp = Vec::with_capacity(usize::from(n));
                for j in 0..u64::from(n) {
                    match read_u8(bytes, off + j, rounds) {
                        Some(b) => tmp.push(b),
                        None => break,
                    }
                }
                (tmp.len() == usize::from(n))
                    .then(|| util::u8_array_from(store.arena_mut(), &tmp))
            }
            FieldKind::U16LeArray(n) => {
                let mut tmp = Vec::with_capacity(usize::from(n));
                for j in 0..u64::from(n) {
                    match read_u16le(bytes, off + j * 2, rounds) {
                        Some(v) => tmp.push(v),
                        None => break,
                    }
                }
                (tmp.len() == usize::from(n))
                    .then(|| util::u16_slice_value(store.arena_mut(), &tmp))
            }
            FieldKind::I16LeArray(n) => {
                let mut tmp = Vec::with_capacity(usize::from(n));
                for j in 0..u64::from(n) {
                    match read_i16le(bytes, off + j * 2, rounds) {
                        Some(v) => tmp.push(v),
                        None => break,
                    }
                }
                (tmp.len() == usize::from(n))
                    .then(|| util::i16_slice_value(store.arena_mut(), &tmp))
            }
            FieldKind::Bytes(n) => {
                if off + u64::from(n) > bytes.len() as u64 {
                    None
                } else {
                    Some(deciphered_bytes(store.arena_mut(), bytes, off, u32::from(n), rounds))
                }
            }
        };
        if let Some(value) = value {
            list.push(field.tag, value);
        }
    }
    list.emit(ifd_name, store, options, result);
}

const TAG9402: &[CipherField] = &[
    f(0x0002, FieldKind::U8), // AmbientTemperature
    f(0x0004, FieldKind::U8), // FocusMode
    f(0x0016, FieldKind::U8), // AFAreaMode
    f(0x0017, FieldKind::U8), // FocusPosition2
    f(0x002D, FieldKind::U8),
];

const TAG9403: &[CipherField] = &[
    f(0x0004, FieldKind::U8), // CameraTemperature
    f(0x0005, FieldKind::U8),
    f(0x0019, FieldKind::U16Le),
];

const TAG9400A: &[CipherField] = &[
    f(0x0008, FieldKind::U32Le), // SequenceImageNumber
    f(0x000C, FieldKind::U32Le), // SequenceFileNumber
    f(0x0010, FieldKind::U8),    // ReleaseMode2
    f(0x0012, FieldKind::U8),    // DigitalZoom
    f(0x001A, FieldKind::U32Le), // ShotNumberSincePowerUp
    f(0x0022, FieldKind::U8),    // SequenceLength
    f(0x0028, FieldKind::U8),    // CameraOrientation
    f(0x0029, FieldKind::U8),    // Quality2
    f(0x0044, FieldKind::U16Le), // SonyImageHeight
    f(0x0052, FieldKind::U8),    // ModelReleaseYear
];

const TAG9406: &[CipherField] = &[
    f(0x0005, FieldKind::U8), // BatteryTemperature
    f(0x0006, FieldKind::U8), // BatteryLevelGrip1
    f(0x0007, FieldKind::U8),
    f(0x0008, FieldKind::U8), // BatteryLevel
];

const TAG940C: &[CipherField] = &[
    f(0x0008, FieldKind::U8),    // LensMount2
    f(0x0009, FieldKind::U16Le), // LensType3
    f(0x000B, FieldKind::U16Le),
    f(0x000D, FieldKind::U16Le),
    f(0x0014, FieldKind::U16Le),
];

const TAG9404B: &[CipherField] = &[
    f(0x000C, FieldKind::U8), // ExposureProgram
    f(0x000E, FieldKind::U8), // IntelligentAuto
    f(0x001E, FieldKind::U16Le), // LensZoomPosition
];

const TAG9404C: &[CipherField] = &[
    f(0x000B, FieldKind::U8),
    f(0x000D, FieldKind::U8), // IntelligentAuto
];

const TAG202A: &[CipherField] = &[f(0x0001, FieldKind::U8)];

const TAG9405A: &[CipherField] = &[
    f(0x0600, FieldKind::U8), // DistortionCorrParamsPresent
    f(0x0601, FieldKind::U8),
    f(0x0603, FieldKind::U8), // LensFormat
    f(0x0604, FieldKind::U8), // LensMount
    f(0x0605, FieldKind::U16Le), // LensType2
    f(0x0608, FieldKind::U16Le), // LensType
    f(0x064A, FieldKind::I16LeArray(16)), // VignettingCorrParams
    f(0x066A, FieldKind::I16LeArray(32)), // ChromaticAberrationCorrParams
    f(0x06CA, FieldKind::I16LeArray(16)), // DistortionCorrParams
];

const TAG2010B: &[CipherField] = &[
    f(0x0000, FieldKind::U32Le),
    f(0x0004, FieldKind::U32Le),
    f(0x0008, FieldKind::U32Le),
    f(0x01B6, FieldKind::Bytes(7)),
    f(0x0324, FieldKind::U8),
    f(0x1128, FieldKind::U8),
    f(0x112C, FieldKind::U8),
    f(0x1134, FieldKind::U8),
    f(0x1138, FieldKind::U8),
    f(0x113E, FieldKind::U16Le),
    f(0x1140, FieldKind::U16Le),
    f(0x1144, FieldKind::U8),
    f(0x1148, FieldKind::U8),
    f(0x114C, FieldKind::I16Le),
    f(0x1162, FieldKind::U8),
    f(0x1163, FieldKind::U8),
    f(0x1167, FieldKind::U8),
    f(0x1174, FieldKind::U8),
    f(0x1178, FieldKind::U8),
    f(0x1179, FieldKind::U8),
    f(0x1180, FieldKind::U16LeArray(3)),
    f(0x1218, FieldKind::U16Le),
    f(0x1A23, FieldKind::I16LeArray(16)),
];

const TAG2010E: &[CipherField] = &[
    f(0x0000, FieldKind::U32Le),
    f(0x0004, FieldKind::U32Le),
    f(0x0008, FieldKind::U32Le),
    f(0x021C, FieldKind::U8),
    f(0x022C, FieldKind::Bytes(7)),
    f(0x0328, FieldKind::U8),
    f(0x115C, FieldKind::U8),
    f(0x1160, FieldKind::U8),
    f(0x1168, FieldKind::U8),
    f(0x116C, FieldKind::U8),
    f(0x1172, FieldKind::U16Le),
    f(0x1174, FieldKind::U16Le),
    f(0x1178, FieldKind::U8),
    f(0x117C, FieldKind::U8),
    f(0x1180, FieldKind::I16Le),
    f(0x1196, FieldKind::U8),
    f(0x1197, FieldKind::U8),
    f(0x119B, FieldKind::U8),
    f(0x11A8, FieldKind::U8),
    f(0x11AC, FieldKind::U8),
    f(0x11AD, FieldKind::U8),
    f(0x11B4, FieldKind::U16LeArray(3)),
    f(0x1254, FieldKind::U16Le),          // SonyISO
    f(0x1870, FieldKind::I16LeArray(16)), // DistortionCorrParams
    f(0x1891, FieldKind::U8),             // LensFormat
    f(0x1892, FieldKind::U8),             // LensMount
    f(0x1893, FieldKind::U16Le),          // LensType2
    f(0x1896, FieldKind::U16Le),          // LensType
    f(0x1898, FieldKind::U8),
    f(0x1899, FieldKind::U8),
    f(0x192C, FieldKind::U8), // AspectRatio
    f(0x1A88, FieldKind::U8), // AspectRatio (RX100/Stellar)
];

const TAG2010I: &[CipherField] = &[
    f(0x0004, FieldKind::U8),
    f(0x004E, FieldKind::U8),
    f(0x0204, FieldKind::U8),
    f(0x0208, FieldKind::U8),
    f(0x0210, FieldKind::U8),
    f(0x0211, FieldKind::U8),
    f(0x021B, FieldKind::U8),
    f(0x021F, FieldKind::U8),
    f(0x0237, FieldKind::U8),
    f(0x0238, FieldKind::U8),
    f(0x023C, FieldKind::U8),
    f(0x0247, FieldKind::U8),
    f(0x024B, FieldKind::U8),
    f(0x024C, FieldKind::U8),
    f(0x17F1, FieldKind::U8),
    f(0x17F2, FieldKind::U8),
    f(0x17F8, FieldKind::U8),
    f(0x17F9, FieldKind::U8),
    f(0x188C, FieldKind::U8),
    f(0x0217, FieldKind::I16Le),
    f(0x0219, FieldKind::I16Le),
    f(0x0223, FieldKind::I16Le),
    f(0x0252, FieldKind::U16LeArray(3)), // WB_RGBLevels
    f(0x030A, FieldKind::U16Le),
    f(0x030C, FieldKind::U16Le),
    f(0x030E, FieldKind::U16Le),
    f(0x0320, FieldKind::U16Le),
    f(0x17F3, FieldKind::U16Le), // LensType2
    f(0x17F6, FieldKind::U16Le), // LensType
    f(0x17D0, FieldKind::Bytes(32)), // DistortionCorrParams prefix
];

const TAG9050A: &[CipherField] = &[
    f(0x0000, FieldKind::U8),
    f(0x0001, FieldKind::U8),
    f(0x0020, FieldKind::U16LeArray(3)), // Shutter
    f(0x0031, FieldKind::U8),
    f(0x0032, FieldKind::U32Le),
    f(0x003A, FieldKind::U16Le),
    f(0x003C, FieldKind::U16Le),
    f(0x003F, FieldKind::U8),
    f(0x0067, FieldKind::U8),
    f(0x007C, FieldKind::U8Array(4)),
    f(0x00F0, FieldKind::U8Array(5)),
    f(0x0105, FieldKind::U8),
    f(0x0106, FieldKind::U8),
    f(0x0107, FieldKind::U16Le),
    f(0x0109, FieldKind::U16Le),
    f(0x010B, FieldKind::U8),
    f(0x0114, FieldKind::U8),
    f(0x0116, FieldKind::U8Array(2)),
    f(0x01AA, FieldKind::U32Le),
    f(0x01BD, FieldKind::U32Le),
];

const TAG9050B: &[CipherField] = &[
    f(0x0000, FieldKind::U8),
    f(0x0001, FieldKind::U8),
    f(0x0039, FieldKind::U8),
    f(0x004B, FieldKind::U8),
    f(0x006B, FieldKind::U8),
    f(0x006D, FieldKind::U8),
    f(0x0073, FieldKind::U8),
    f(0x0105, FieldKind::U8),
    f(0x0106, FieldKind::U8),
    f(0x010B, FieldKind::U8),
    f(0x0114, FieldKind::U8),
    f(0x01EB, FieldKind::U8),
    f(0x01EE, FieldKind::U8),
    f(0x021A, FieldKind::U8),
    f(0x0046, FieldKind::U16Le),
    f(0x0048, FieldKind::U16Le),
    f(0x0026, FieldKind::U16LeArray(3)), // Shutter
    f(0x003A, FieldKind::U32Le),
    f(0x0050, FieldKind::U32Le), // ShutterCount2
    f(0x0052, FieldKind::U32Le),
    f(0x0058, FieldKind::U32Le),
    f(0x019F, FieldKind::U32Le),
    f(0x01CB, FieldKind::U32Le),
    f(0x01CD, FieldKind::U32Le),
    f(0x0107, FieldKind::U16Le), // LensType2
    f(0x0109, FieldKind::U16Le), // LensType
    f(0x0061, FieldKind::U8Array(2)), // SonyTimeMinSec
    f(0x0088, FieldKind::U8Array(6)), // InternalSerialNumber
    f(0x0116, FieldKind::U8Array(2)),
    f(0x01ED, FieldKind::U8Array(2)),
    f(0x01F0, FieldKind::U8Array(2)),
    f(0x021C, FieldKind::U8Array(2)),
    f(0x021E, FieldKind::U8Array(2)),
];

const TAG9050C: &[CipherField] = &[
    f(0x0026, FieldKind::U16LeArray(3)), // Shutter
    f(0x0039, FieldKind::U8),
    f(0x004B, FieldKind::U8),
    f(0x006B, FieldKind::U8),
    f(0x0046, FieldKind::U16Le),
    f(0x0048, FieldKind::U16Le),
    f(0x0066, FieldKind::U16Le),
    f(0x0068, FieldKind::U16Le),
    f(0x003A, FieldKind::U32Le),
    f(0x0050, FieldKind::U32Le),
    f(0x0088, FieldKind::U8Array(6)), // InternalSerialNumber
];

pub(crate) fn detect(ctx: &NoteContext<'_>) -> bool {
    ctx.note_starts(b"SONY") || ctx.note_starts(b"VHAB") || ctx.make_has("SONY")
}

pub(crate) fn decode(
    ctx: &NoteContext<'_>,
    mk: &MkTokens,
    store: &mut MetaStore,
    options: &ExifDecodeOptions,
    result: &mut ExifDecodeResult,
) -> bool {
    let note = ctx.note();
    if note.len() < 8 {
        return false;
    }
    let mut parent_cfg = ctx.cfg;
    parent_cfg.bigtiff = false;

    // Headerless IFD with absolute offsets (ARW bodies).
    if classic::looks_like_classic_ifd(parent_cfg, ctx.tiff, ctx.note_off, &options.limits)
        && has_absolute_offsets(ctx, parent_cfg, options)
    {
        classic::decode_ifd_no_header(
            parent_cfg,
            ctx.tiff,
            ctx.note_off,
            &mk.ifd0,
            BlockId::INVALID,
            OffsetPolicy::absolute(),
            EntryFlags::NONE,
            store,
            options,
            result,
            |_, _| {},
        );
        decode_cipher_subdirs(ctx, mk, store, options, result);
        return true;
    }

    if ctx.note_starts(b"VHAB") {
        let ifd_off = ctx.note_off + 12;
        let mut best: Option<ClassicIfdCandidate> = None;
        for order in [ByteOrder::LittleEndian, ByteOrder::BigEndian] {
            let cfg = TiffConfig::classic(order);
            if let Some(cand) =
                classic::score_classic_ifd_candidate(cfg, ctx.tiff, ifd_off, &options.limits)
            {
                let table = 2 + u64::from(cand.entry_count) * 12 + 4;
                if ifd_off + table > ctx.note_off + ctx.note_len {
                    continue;
                }
                if best.is_none_or(|b| cand.valid_entries > b.valid_entries) {
                    best = Some(cand);
                }
            }
        }
        let Some(best) = best else {
            return false;
        };
        let cfg = TiffConfig::classic(le_or_be(best.le));
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
        decode_cipher_subdirs(ctx, mk, store, options, result);
        return true;
    }

    if !ctx.note_starts(b"SONY") {
        return false;
    }

    // Scored search over the leading 256 bytes, both endiannesses; the IFD
    // uses absolute offsets into the outer stream.
    let scan_end = ctx.note_off + ctx.note_len.min(256);
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
            let table = 2 + u64::from(cand.entry_count) * 12 + 4;
            if abs_off + table > note_end {
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
    let Some(best) = best else {
        return false;
    };
    let cfg = TiffConfig::classic(le_or_be(best.le));
    classic::decode_ifd_no_header(
        cfg,
        ctx.tiff,
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
    decode_cipher_subdirs(ctx, mk, store, options, result);
    true
}

fn le_or_be(le: bool) -> ByteOrder {
    if le {
        ByteOrder::LittleEndian
    } else {
        ByteOrder::BigEndian
    }
}

/// True when at least one out-of-line offset lands past the IFD table when
/// read as an absolute stream offset.
fn has_absolute_offsets(
    ctx: &NoteContext<'_>,
    cfg: TiffConfig,
    options: &ExifDecodeOptions,
) -> bool {
    let Some(entry_count) = cfg.read_u16(ctx.tiff, ctx.note_off) else {
        return false;
    };
    if entry_count == 0 || u32::from(entry_count) > options.limits.max_entries_per_ifd {
        return false;
    }
    let table = 2 + u64::from(entry_count) * 12 + 4;
    if ctx.note_off + table > ctx.note_off + ctx.note_len {
        return false;
    }
    for i in 0..u64::from(entry_count) {
        let Some(raw) = classic::read_ifd_entry(cfg, ctx.tiff, ctx.note_off + 2 + i * 12) else {
            break;
        };
        let Some(value_bytes) = classic::entry_value_bytes(&raw) else {
            continue;
        };
        if raw.count == 0 || value_bytes <= 4 {
            continue;
        }
        if raw.value_or_off >= ctx.note_off + table
            && raw.value_or_off + value_bytes <= ctx.tiff.len() as u64
        {
            return true;
        }
    }
    false
}

/// Post-pass over the main-IFD entries holding ciphered subdirectories.
fn decode_cipher_subdirs(
    ctx: &NoteContext<'_>,
    mk: &MkTokens,
    store: &mut MetaStore,
    options: &ExifDecodeOptions,
    result: &mut ExifDecodeResult,
) {
    const SUBDIR_TAGS: [u16; 14] = [
        0x9050, 0x3000, 0x9400, 0x9401, 0x9402, 0x9403, 0x9404, 0x9405, 0x9406, 0x940C, 0x940E,
        0x9416, 0x2010, 0x202A,
    ];

    let model = ctx.model.as_str();
    let is_slt = model.starts_with("SLT-") || model.starts_with("ILCA-") || model == "HV";
    let is_lunar = model == "Lunar";
    let is_stellar = model == "Stellar";

    for tag in SUBDIR_TAGS {
        let Some(raw) = util::entry_bytes_copy(store, &mk.ifd0, tag) else {
            continue;
        };
        match tag {
            0x3000 => decode_shotinfo(&raw, &mk.subtable("shotinfo", 0), store, options, result),
            0x2010 => {
                if is_lunar {
                    decode_cipher_fields(&raw, &mk.subtable("tag2010b", 0), 1, TAG2010B, store, options, result);
                    decode_meterinfo_blob(&raw, 0x04B4, &mk.subtable("meterinfo", 0), store, options, result);
                } else if is_slt || is_stellar {
                    decode_cipher_fields(&raw, &mk.subtable("tag2010e", 0), 1, TAG2010E, store, options, result);
                    decode_meterinfo_blob(&raw, 0x04B8, &mk.subtable("meterinfo", 0), store, options, result);
                } else {
                    decode_cipher_fields(&raw, &mk.subtable("tag2010i", 0), 1, TAG2010I, store, options, result);
                    decode_meterinfo9(&raw, &mk.subtable("meterinfo9", 0), store, options, result);
                }
            }
            0x202A => decode_cipher_fields(&raw, &mk.subtable("tag202a", 0), 1, TAG202A, store, options, result),
            0x9400 => {
                const ALLOWED: [u8; 11] = [0x07, 0x09, 0x0A, 0x0C, 0x23, 0x24, 0x26, 0x28, 0x31, 0x32, 0x33];
                let rounds = guess_rounds(&raw, 0, &ALLOWED);
                if is_lunar || is_slt || is_stellar {
                    decode_cipher_fields(&raw, &mk.subtable("tag9400a", 0), rounds, TAG9400A, store, options, result);
                } else {
                    decode_tag9400(&raw, rounds, mk, store, options, result);
                }
            }
            0x9401 => decode_isoinfo(&raw, &mk.subtable("isoinfo", 0), store, options, result),
            0x9402 => decode_cipher_fields(&raw, &mk.subtable("tag9402", 0), 1, TAG9402, store, options, result),
            0x9403 => decode_cipher_fields(&raw, &mk.subtable("tag9403", 0), 1, TAG9403, store, options, result),
            0x9404 => {
                if is_lunar || is_stellar {
                    decode_cipher_fields(&raw, &mk.subtable("tag9404b", 0), 1, TAG9404B, store, options, result);
                } else {
                    decode_cipher_fields(&raw, &mk.subtable("tag9404c", 0), 1, TAG9404C, store, options, result);
                }
            }
            0x9405 => {
                if is_slt || is_lunar || is_stellar {
                    decode_cipher_fields(&raw, &mk.subtable("tag9405a", 0), 1, TAG9405A, store, options, result);
                } else {
                    decode_tag9405b(&raw, &mk.subtable("tag9405b", 0), store, options, result);
                }
            }
            0x9406 => decode_cipher_fields(&raw, &mk.subtable("tag9406", 0), 1, TAG9406, store, options, result),
            0x940C => decode_cipher_fields(&raw, &mk.subtable("tag940c", 0), 1, TAG940C, store, options, result),
            0x940E => {
                if is_slt {
                    decode_afinfo(&raw, mk, store, options, result);
                } else {
                    decode_tag940e(&raw, &mk.subtable("tag940e", 0), store, options, result);
                }
            }
            0x9416 => decode_tag9416(&raw, &mk.subtable("tag9416", 0), store, options, result),
            0x9050 => {
                let (subtable, table): (&str, &[CipherField]) = if is_slt || is_lunar {
                    ("tag9050a", TAG9050A)
                } else if model.contains("7RM5")
                    || model.contains("7M4")
                    || model.contains("7SM3")
                    || model.starts_with("ILCE-1")
                    || model.starts_with("ILME-")
                {
                    ("tag9050c", TAG9050C)
                } else {
                    ("tag9050b", TAG9050B)
                };
                let name = mk.subtable(subtable, 0);
                decode_cipher_fields(&raw, &name, 1, table, store, options, result);
            }
            _ => {}
        }
    }
}

/// Tag9400 b/c variant pick by the first deciphered byte.
fn decode_tag9400(
    raw: &[u8],
    rounds: u32,
    mk: &MkTokens,
    store: &mut MetaStore,
    options: &ExifDecodeOptions,
    result: &mut ExifDecodeResult,
) {
    let Some(v0) = read_u8(raw, 0, rounds) else {
        return;
    };
    let subtable = if v0 == 0x0C { "tag9400b" } else { "tag9400c" };
    let ifd_name = mk.subtable(subtable, 0);

    let mut list = TagListBuilder::new();
    if let Some(v) = read_u32le(raw, 0x0012, rounds) {
        list.push(0x0012, MetaValue::u32(v)); // SequenceImageNumber
    }
    if let Some(v) = read_u32le(raw, 0x001A, rounds) {
        list.push(0x001A, MetaValue::u32(v)); // SequenceFileNumber
    }
    if let Some(v) = read_u16le(raw, 0x0053, rounds) {
        list.push(0x0053, MetaValue::u16(v)); // ModelReleaseYear
    }
    for tag in [0x0009u16, 0x000A, 0x0016, 0x001E, 0x0029, 0x002A] {
        if let Some(v) = read_u8(raw, u64::from(tag), rounds) {
            list.push(tag, MetaValue::u8(v));
        }
    }
    list.emit(&ifd_name, store, options, result);
}

/// ISOInfo inside Tag9401: probe the known per-firmware offsets and keep
/// the most plausible candidate.
fn decode_isoinfo(
    raw: &[u8],
    ifd_name: &str,
    store: &mut MetaStore,
    options: &ExifDecodeOptions,
    result: &mut ExifDecodeResult,
) {
    const OFFSETS: [u16; 18] = [
        0x03E2, 0x03F4, 0x044E, 0x0498, 0x049D, 0x049E, 0x04A1, 0x04A2, 0x04BA, 0x059D, 0x0634,
        0x0636, 0x064C, 0x0653, 0x0678, 0x06B8, 0x06DE, 0x06E7,
    ];
    let mut best: Option<(u32, u8, u8, u8)> = None;
    for base in OFFSETS {
        let base = u64::from(base);
        if base + 5 > raw.len() as u64 {
            continue;
        }
        let (Some(setting), Some(min), Some(max)) = (
            read_u8(raw, base, 1),
            read_u8(raw, base + 2, 1),
            read_u8(raw, base + 4, 1),
        ) else {
            continue;
        };
        // ISO codes are small enum values.
        let mut score = 0u32;
        score += u32::from(setting <= 80);
        score += u32::from(min <= 80);
        score += u32::from(max <= 80);
        score += u32::from(setting == 0);
        if best.is_none_or(|(s, ..)| score > s) {
            best = Some((score, setting, min, max));
        }
    }
    let Some((score, setting, min, max)) = best else {
        return;
    };
    if score == 0 {
        return;
    }
    let mut list = TagListBuilder::new();
    list.push(0x0000, MetaValue::u8(setting));
    list.push(0x0002, MetaValue::u8(min));
    list.push(0x0004, MetaValue::u8(max));
    list.emit(ifd_name, store, options, result);
}

/// ShotInfo (tag 0x3000): plaintext fixed block with its own endian pair.
fn decode_shotinfo(
    raw: &[u8],
    ifd_name: &str,
    store: &mut MetaStore,
    options: &ExifDecodeOptions,
    result: &mut ExifDecodeResult,
) {
    if raw.len() < 0x44 {
        return;
    }
    let order = match (raw[0], raw[1]) {
        (b'I', b'I') => ByteOrder::LittleEndian,
        (b'M', b'M') => ByteOrder::BigEndian,
        _ => return,
    };
    let mut list = TagListBuilder::new();
    list.push(0x0002, util::u16_value(raw, 0x0002, order)); // FaceFrameSize
    list.push(0x0006, util::ascii_text(store.arena_mut(), raw, 0x0006, 20)); // SonyDateTime
    list.push(0x001A, util::u16_value(raw, 0x001A, order)); // SonyImageHeight
    list.push(0x001C, util::u16_value(raw, 0x001C, order)); // SonyImageWidth
    list.push(0x0030, util::u16_value(raw, 0x0030, order)); // FacesDetected
    list.push(0x0032, util::u16_value(raw, 0x0032, order)); // FaceDetectFrameSize
    list.push(0x0034, util::ascii_text(store.arena_mut(), raw, 0x0034, 16)); // MetaVersion
    list.emit(ifd_name, store, options, result);
}

/// Tag9405b layout for newer ILCE/DSC bodies.
fn decode_tag9405b(
    raw: &[u8],
    ifd_name: &str,
    store: &mut MetaStore,
    options: &ExifDecodeOptions,
    result: &mut ExifDecodeResult,
) {
    let rounds = 1;
    let mut list = TagListBuilder::new();
    for tag in [0x0004u16, 0x0006, 0x000A, 0x000E, 0x0014, 0x0016, 0x003E, 0x0040, 0x0342, 0x034E] {
        if let Some(v) = read_u16le(raw, u64::from(tag), rounds) {
            list.push(tag, MetaValue::u16(v));
        }
    }
    for tag in [0x0034u16, 0x0042, 0x0044, 0x0046, 0x0048, 0x004A, 0x0052, 0x005A, 0x005B, 0x005D, 0x005E] {
        if let Some(v) = read_u8(raw, u64::from(tag), rounds) {
            list.push(tag, MetaValue::u8(v));
        }
    }
    // ExposureTime rational at 0x0010, SequenceImageNumber at 0x0024.
    if let (Some(numer), Some(denom)) =
        (read_u32le(raw, 0x0010, rounds), read_u32le(raw, 0x0010 + 4, rounds))
    {
        list.push(0x0010, util::make_urational(store.arena_mut(), numer, denom));
    }
    if let Some(v) = read_u32le(raw, 0x0024, rounds) {
        list.push(0x0024, MetaValue::u32(v));
    }
    for tag in [0x0060u16, 0x0062] {
        if let Some(v) = read_u16le(raw, u64::from(tag), rounds) {
            list.push(tag, MetaValue::u16(v));
        }
    }
    // Distortion / vignetting / chromatic-aberration parameter arrays.
    push_i16_array(&mut list, store, raw, 0x0064, 16, rounds);
    for tag in [0x034Au16, 0x0350, 0x035C, 0x0368] {
        push_i16_array(&mut list, store, raw, tag, 16, rounds);
    }
    for tag in [0x037Cu16, 0x0384, 0x039C, 0x03B0, 0x03B8] {
        push_i16_array(&mut list, store, raw, tag, 32, rounds);
    }
    list.emit(ifd_name, store, options, result);
}

/// Tag9416: the consolidated shot-info layout on current bodies.
fn decode_tag9416(
    raw: &[u8],
    ifd_name: &str,
    store: &mut MetaStore,
    options: &ExifDecodeOptions,
    result: &mut ExifDecodeResult,
) {
    const ALLOWED_VERSIONS: [u8; 11] =
        [0x06, 0x07, 0x08, 0x09, 0x0C, 0x0D, 0x0F, 0x10, 0x11, 0x17, 0x1B];
    let rounds = guess_rounds(raw, 0, &ALLOWED_VERSIONS);

    let mut list = TagListBuilder::new();
    for tag in [0x0000u16, 0x002B, 0x0035, 0x0037, 0x0048, 0x0049, 0x004A, 0x0070] {
        if let Some(v) = read_u8(raw, u64::from(tag), rounds) {
            list.push(tag, MetaValue::u8(v));
        }
    }
    for tag in [0x0004u16, 0x0006, 0x000A, 0x0010, 0x0012, 0x004B, 0x0071, 0x0073, 0x0075] {
        if let Some(v) = read_u16le(raw, u64::from(tag), rounds) {
            list.push(tag, MetaValue::u16(v));
        }
    }
    // SequenceImageNumber and the ExposureTime rational.
    if let Some(v) = read_u32le(raw, 0x001D, rounds) {
        list.push(0x001D, MetaValue::u32(v));
    }
    if let (Some(numer), Some(denom)) =
        (read_u32le(raw, 0x000C, rounds), read_u32le(raw, 0x000C + 4, rounds))
    {
        list.push(0x000C, util::make_urational(store.arena_mut(), numer, denom));
    }
    // Lens correction parameter arrays.
    push_i16_array(&mut list, store, raw, 0x004F, 16, rounds); // distortion
    push_i16_array(&mut list, store, raw, 0x089D, 32, rounds); // vignetting
    push_i16_array(&mut list, store, raw, 0x0945, 32, rounds); // chromatic aberration
    if let Some(v) = read_u8(raw, 0x08E5, rounds) {
        list.push(0x08E5, MetaValue::u8(v)); // APS-C size capture
    }
    list.emit(ifd_name, store, options, result);
}

fn push_i16_array(
    list: &mut TagListBuilder,
    store: &mut MetaStore,
    raw: &[u8],
    tag: u16,
    n: usize,
    rounds: u32,
) {
    let mut values = Vec::with_capacity(n);
    for j in 0..n as u64 {
        match read_i16le(raw, u64::from(tag) + j * 2, rounds) {
            Some(v) => values.push(v),
            None => return,
        }
    }
    list.push(tag, util::i16_slice_value(store.arena_mut(), &values));
}

/// SLT-family AFInfo inside Tag940e.
fn decode_afinfo(
    raw: &[u8],
    mk: &MkTokens,
    store: &mut MetaStore,
    options: &ExifDecodeOptions,
    result: &mut ExifDecodeResult,
) {
    const ALLOWED_AF_TYPE: [u8; 7] = [0, 1, 2, 3, 6, 9, 11];
    let rounds = guess_rounds(raw, 0x0002, &ALLOWED_AF_TYPE);

    let mut list = TagListBuilder::new();
    for tag in [0x0002u16, 0x0004, 0x0007, 0x0008, 0x0009, 0x000A, 0x000B] {
        if let Some(v) = read_u8(raw, u64::from(tag), rounds) {
            list.push(tag, MetaValue::u8(v));
        }
    }
    if let Some(v) = read_u32le(raw, 0x016E, rounds) {
        list.push(0x016E, MetaValue::u32(v));
    }
    if let Some(v) = read_u8(raw, 0x017D, rounds) {
        list.push(0x017D, MetaValue::scalar_u64(openmeta_core::ElemType::I8, v as i8 as i64 as u64));
    }
    if let Some(v) = read_u8(raw, 0x017E, rounds) {
        list.push(0x017E, MetaValue::u8(v));
    }
    list.emit(&mk.subtable("afinfo", 0), store, options, result);

    // Per-point AF status arrays, sized by the AF type.
    let af_type = read_u8(raw, 0x0002, rounds).unwrap_or(0);
    let (subtable, count) = match af_type {
        2 => ("afstatus19", 30usize),
        1 => ("afstatus15", 18),
        _ => return,
    };
    let mut status = TagListBuilder::new();
    let mut values = Vec::with_capacity(count);
    for j in 0..count as u64 {
        match read_i16le(raw, 0x0011 + j * 2, rounds) {
            Some(v) => values.push(v),
            None => return,
        }
    }
    status.push(0x0011, util::i16_slice_value(store.arena_mut(), &values));
    status.emit(&mk.subtable(subtable, 0), store, options, result);
}

/// Non-SLT Tag940e: the metering image with u8 dimensions at 0x1A06.
fn decode_tag940e(
    raw: &[u8],
    ifd_name: &str,
    store: &mut MetaStore,
    options: &ExifDecodeOptions,
    result: &mut ExifDecodeResult,
) {
    let mut rounds = 1;
    let (mut w, mut h) = (
        read_u8(raw, 0x1A06, 1).unwrap_or(0),
        read_u8(raw, 0x1A07, 1).unwrap_or(0),
    );
    if w == 0 || h == 0 {
        rounds = 2;
        w = read_u8(raw, 0x1A06, 2).unwrap_or(0);
        h = read_u8(raw, 0x1A07, 2).unwrap_or(0);
    }
    if w == 0 || h == 0 {
        return;
    }
    let image_bytes = u32::from(w) * u32::from(h) * 2;
    if image_bytes == 0
        || image_bytes > options.limits.max_value_bytes
        || 0x1A08 + u64::from(image_bytes) > raw.len() as u64
    {
        return;
    }
    let img = deciphered_bytes(store.arena_mut(), raw, 0x1A08, image_bytes, rounds);
    let mut list = TagListBuilder::new();
    list.push(0x1A06, MetaValue::u8(w));
    list.push(0x1A07, MetaValue::u8(h));
    list.push(0x1A08, img);
    list.emit(ifd_name, store, options, result);
}

/// Fixed-size metering blob inside Tag2010b/e.
fn decode_meterinfo_blob(
    raw: &[u8],
    meter_off: u64,
    ifd_name: &str,
    store: &mut MetaStore,
    options: &ExifDecodeOptions,
    result: &mut ExifDecodeResult,
) {
    const METER_BYTES: u32 = 486 * 4;
    if meter_off + u64::from(METER_BYTES) > raw.len() as u64
        || METER_BYTES > options.limits.max_value_bytes
    {
        return;
    }
    let v = deciphered_bytes(store.arena_mut(), raw, meter_off, METER_BYTES, 1);
    let mut list = TagListBuilder::new();
    list.push(meter_off as u16, v);
    list.emit(ifd_name, store, options, result);
}

/// MeterInfo9 rows inside Tag2010i: seven 0x5A-byte rows then nine
/// 0x6E-byte rows, tag ids are the row offsets.
fn decode_meterinfo9(
    raw: &[u8],
    ifd_name: &str,
    store: &mut MetaStore,
    options: &ExifDecodeOptions,
    result: &mut ExifDecodeResult,
) {
    const ROWS: [(u16, u16); 16] = [
        (0x0000, 0x005A), (0x005A, 0x005A), (0x00B4, 0x005A), (0x010E, 0x005A),
        (0x0168, 0x005A), (0x01C2, 0x005A), (0x021C, 0x005A), (0x0276, 0x006E),
        (0x02E4, 0x006E), (0x0352, 0x006E), (0x03C0, 0x006E), (0x042E, 0x006E),
        (0x049C, 0x006E), (0x050A, 0x006E), (0x0578, 0x006E), (0x05E6, 0x006E),
    ];
    let mut list = TagListBuilder::new();
    for (tag, len) in ROWS {
        if u64::from(tag) + u64::from(len) > raw.len() as u64 {
            continue;
        }
        if u32::from(len) > options.limits.max_value_bytes {
            continue;
        }
        let v = deciphered_bytes(store.arena_mut(), raw, u64::from(tag), u32::from(len), 1);
        list.push(tag, v);
    }
    list.emit(ifd_name, store, options, result);
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Encipher: c = b^3 mod 249 (bytes >= 249 unchanged).
    fn encipher(b: u8) -> u8 {
        if b >= 249 {
            return b;
        }
        mod_pow_249(u32::from(b), 3) as u8
    }

    #[test]
    fn decipher_inverts_cube() {
        for b in 0u8..=255 {
            if b < 249 {
                assert_eq!(decipher(encipher(b), 1), b, "byte {b}");
            } else {
                assert_eq!(decipher(b, 1), b);
            }
        }
    }

    #[test]
    fn two_round_cipher_round_trips() {
        for b in 0u8..249 {
            assert_eq!(decipher(encipher(encipher(b)), 2), b);
        }
    }

    #[test]
    fn cipher_fields_decode_enciphered_blob() {
        // Plain blob with known values at TAG9403 offsets, then enciphered.
        let mut plain = vec![0u8; 0x40];
        plain[0x04] = 25; // CameraTemperature
        plain[0x05] = 3;
        plain[0x19..0x1B].copy_from_slice(&1234u16.to_le_bytes());
        let ciphered: Vec<u8> = plain.iter().map(|&b| encipher(b)).collect();

        let options = ExifDecodeOptions::default();
        let mut store = MetaStore::new();
        let mut result = ExifDecodeResult::default();
        decode_cipher_fields(
            &ciphered,
            "mk_sony_tag9403_0",
            1,
            TAG9403,
            &mut store,
            &options,
            &mut result,
        );

        let entries: Vec<_> = store.entries().iter().collect();
        assert_eq!(entries.len(), 3);
        assert_eq!(entries[0].value.as_u64(), Some(25));
        assert_eq!(entries[2].value.as_u32(), Some(1234));
    }

    #[test]
    fn rounds_guessed_from_version_byte() {
        // Version byte 0x23 enciphered twice needs two rounds.
        let plain = 0x23u8;
        let twice = encipher(encipher(plain));
        let blob = [twice, 0, 0, 0];
        const ALLOWED: [u8; 3] = [0x07, 0x23, 0x26];
        assert_eq!(guess_rounds(&blob, 0, &ALLOWED), 2);
        let once = [encipher(plain), 0, 0, 0];
        assert_eq!(guess_rounds(&once, 0, &ALLOWED), 1);
    }

    #[test]
    fn shotinfo_endian_pair() {
        let mut raw = vec![0u8; 0x50];
        raw[0] = b'M';
        raw[1] = b'M';
        raw[0x1A..0x1C].copy_from_slice(&3000u16.to_be_bytes());
        raw[0x1C..0x1E].copy_from_slice(&4000u16.to_be_bytes());
        let options = ExifDecodeOptions::default();
        let mut store = MetaStore::new();
        let mut result = ExifDecodeResult::default();
        decode_shotinfo(&raw, "mk_sony_shotinfo_0", &mut store, &options, &mut result);
        let height = store
            .entries()
            .iter()
            .find(|e| e.key.exif_tag() == Some(0x001A))
            .unwrap();
        assert_eq!(height.value.as_u32(), Some(3000));
    }
}
