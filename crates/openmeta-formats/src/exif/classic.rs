//! Shared IFD decoding machinery.
//!
//! Both the main EXIF walker and the vendor MakerNote decoders funnel
//! through these helpers. MakerNotes are classic TIFF IFDs in the best
//! case, but their offset fields are interpreted against vendor-specific
//! bases, so every resolution step goes through an [`OffsetPolicy`].

use openmeta_core::{
    reader, ByteArena, ByteSpan, DecodeStatus, ElemType, Entry, EntryFlags, EntryOrigin, MetaKey,
    MetaStore, MetaValue, TextEncoding, TiffConfig, TiffType, WireType,
};
use openmeta_core::{BlockId, ValueKind};
use tracing::debug;

use super::{ExifDecodeLimits, ExifDecodeOptions, ExifDecodeResult};

/// One raw IFD entry, width-normalised across classic TIFF and BigTIFF.
#[derive(Debug, Clone, Copy)]
pub(crate) struct RawIfdEntry {
    pub tag: u16,
    pub wire_type: u16,
    pub count: u64,
    /// Raw offset field value (meaningful when the value is out of line).
    pub value_or_off: u64,
    /// Stream offset of the value/offset field itself (inline values live
    /// here).
    pub value_field_off: u64,
}

/// Resolution of an entry's value window.
#[derive(Debug, Clone, Copy)]
pub(crate) struct IfdValueRef {
    pub value_off: u64,
    pub value_bytes: u64,
    pub inline: bool,
}

/// Rule turning a wire offset field into an absolute stream offset.
///
/// Base 0 is plain TIFF. Vendor MakerNotes use the note's own start, or an
/// adjusted (possibly negative) origin chosen so out-of-line values land
/// where the vendor firmware put them.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub(crate) struct OffsetPolicy {
    pub base: i64,
}

impl OffsetPolicy {
    /// Offsets are absolute within the stream.
    pub fn absolute() -> Self {
        Self { base: 0 }
    }

    /// Offsets are relative to `base`; negative bases are legal and arise
    /// from vendor auto-adjustment.
    pub fn with_base(base: i64) -> Self {
        Self { base }
    }

    /// Absolute offset for a wire offset field, `None` when the sum leaves
    /// the addressable range.
    pub fn resolve(self, off: u64) -> Option<u64> {
        let off = i64::try_from(off).ok()?;
        let abs = self.base.checked_add(off)?;
        u64::try_from(abs).ok()
    }
}

/// Size of one IFD entry record.
pub(crate) fn ifd_entry_size(cfg: TiffConfig) -> u64 {
    if cfg.bigtiff {
        20
    } else {
        12
    }
}

/// Read the entry count at `ifd_off`; `None` when it is unreadable.
pub(crate) fn read_ifd_entry_count(cfg: TiffConfig, bytes: &[u8], ifd_off: u64) -> Option<u64> {
    if cfg.bigtiff {
        cfg.read_u64(bytes, ifd_off)
    } else {
        cfg.read_u16(bytes, ifd_off).map(u64::from)
    }
}

/// Offset of the first entry record.
pub(crate) fn ifd_entries_off(cfg: TiffConfig, ifd_off: u64) -> u64 {
    ifd_off + if cfg.bigtiff { 8 } else { 2 }
}

/// Read one raw entry record at `entry_off`.
pub(crate) fn read_ifd_entry(cfg: TiffConfig, bytes: &[u8], entry_off: u64) -> Option<RawIfdEntry> {
    let tag = cfg.read_u16(bytes, entry_off)?;
    let wire_type = cfg.read_u16(bytes, entry_off + 2)?;
    let (count, value_field_off) = if cfg.bigtiff {
        (cfg.read_u64(bytes, entry_off + 4)?, entry_off + 12)
    } else {
        (u64::from(cfg.read_u32(bytes, entry_off + 4)?), entry_off + 8)
    };
    let value_or_off = cfg.read_offset(bytes, value_field_off)?;
    Some(RawIfdEntry { tag, wire_type, count, value_or_off, value_field_off })
}

/// Total payload bytes of an entry; `None` for unknown types or overflow.
pub(crate) fn entry_value_bytes(e: &RawIfdEntry) -> Option<u64> {
    let elem = openmeta_core::tiff_type_size(e.wire_type);
    if elem == 0 {
        return None;
    }
    elem.checked_mul(e.count)
}

/// Resolve where an entry's payload lives: inline in the value field, or
/// out of line through `policy`.
pub(crate) fn resolve_value_ref(
    cfg: TiffConfig,
    e: &RawIfdEntry,
    policy: OffsetPolicy,
) -> Option<IfdValueRef> {
    let value_bytes = entry_value_bytes(e)?;
    let inline_max = if cfg.bigtiff { 8 } else { 4 };
    if value_bytes <= inline_max {
        Some(IfdValueRef { value_off: e.value_field_off, value_bytes, inline: true })
    } else {
        let value_off = policy.resolve(e.value_or_off)?;
        Some(IfdValueRef { value_off, value_bytes, inline: false })
    }
}

/// Decode an entry's payload window into a [`MetaValue`], copying into the
/// arena. Returns entry-local flags for clipped or oversized payloads; the
/// entry itself is always emittable.
pub(crate) fn decode_tiff_value(
    cfg: TiffConfig,
    bytes: &[u8],
    wire_type: TiffType,
    count: u64,
    vref: IfdValueRef,
    arena: &mut ByteArena,
    limits: &ExifDecodeLimits,
) -> (MetaValue, EntryFlags) {
    if count == 0 {
        return (MetaValue::empty(), EntryFlags::NONE);
    }
    if vref.value_bytes > u64::from(limits.max_value_bytes) {
        return (MetaValue::empty(), EntryFlags::TRUNCATED);
    }
    let Some(window) = reader::window(bytes, vref.value_off, vref.value_bytes) else {
        return (MetaValue::empty(), EntryFlags::UNREADABLE);
    };

    let value = match wire_type {
        TiffType::Ascii => intern_trimmed_text(arena, window, TextEncoding::Ascii),
        TiffType::Undefined => arena.intern(window).map(MetaValue::bytes),
        TiffType::Byte if count == 1 => Some(MetaValue::u8(window[0])),
        TiffType::SByte if count == 1 => {
            Some(MetaValue::scalar_u64(ElemType::I8, window[0] as i8 as i64 as u64))
        }
        TiffType::Byte => copy_array(arena, window, ElemType::U8),
        TiffType::SByte => copy_array(arena, window, ElemType::I8),
        TiffType::Short if count == 1 => cfg.read_u16(bytes, vref.value_off).map(MetaValue::u16),
        TiffType::SShort if count == 1 => reader::read_i16(bytes, vref.value_off, cfg.byte_order)
            .map(MetaValue::i16),
        TiffType::Long | TiffType::Ifd if count == 1 => {
            cfg.read_u32(bytes, vref.value_off).map(MetaValue::u32)
        }
        TiffType::SLong if count == 1 => reader::read_i32(bytes, vref.value_off, cfg.byte_order)
            .map(MetaValue::i32),
        TiffType::Float if count == 1 => reader::read_f32(bytes, vref.value_off, cfg.byte_order)
            .map(MetaValue::f32),
        TiffType::Double if count == 1 => reader::read_f64(bytes, vref.value_off, cfg.byte_order)
            .map(MetaValue::f64),
        TiffType::Long8 | TiffType::Ifd8 if count == 1 => {
            cfg.read_u64(bytes, vref.value_off).map(MetaValue::u64)
        }
        TiffType::SLong8 if count == 1 => cfg
            .read_u64(bytes, vref.value_off)
            .map(|v| MetaValue::scalar_u64(ElemType::I64, v)),
        TiffType::Rational | TiffType::SRational => {
            let signed = wire_type == TiffType::SRational;
            normalize_array(cfg, bytes, vref, 4, arena).map(|span| MetaValue::rational(span, signed))
        }
        TiffType::Short => normalize_array(cfg, bytes, vref, 2, arena)
            .map(|s| MetaValue::array(ElemType::U16, count as u32, s)),
        TiffType::SShort => normalize_array(cfg, bytes, vref, 2, arena)
            .map(|s| MetaValue::array(ElemType::I16, count as u32, s)),
        TiffType::Long | TiffType::Ifd => normalize_array(cfg, bytes, vref, 4, arena)
            .map(|s| MetaValue::array(ElemType::U32, count as u32, s)),
        TiffType::SLong => normalize_array(cfg, bytes, vref, 4, arena)
            .map(|s| MetaValue::array(ElemType::I32, count as u32, s)),
        TiffType::Float => normalize_array(cfg, bytes, vref, 4, arena)
            .map(|s| MetaValue::array(ElemType::F32, count as u32, s)),
        TiffType::Double => normalize_array(cfg, bytes, vref, 8, arena)
            .map(|s| MetaValue::array(ElemType::F64, count as u32, s)),
        TiffType::Long8 | TiffType::Ifd8 => normalize_array(cfg, bytes, vref, 8, arena)
            .map(|s| MetaValue::array(ElemType::U64, count as u32, s)),
        TiffType::SLong8 => normalize_array(cfg, bytes, vref, 8, arena)
            .map(|s| MetaValue::array(ElemType::I64, count as u32, s)),
    };

    match value {
        Some(v) => (v, EntryFlags::NONE),
        None => (MetaValue::empty(), EntryFlags::TRUNCATED),
    }
}

/// Copy a wire array into the arena, swapping each element to the store's
/// canonical little-endian layout.
fn normalize_array(
    cfg: TiffConfig,
    bytes: &[u8],
    vref: IfdValueRef,
    elem_size: u64,
    arena: &mut ByteArena,
) -> Option<ByteSpan> {
    let span = arena.allocate(u32::try_from(vref.value_bytes).ok()?, 1)?;
    let n = vref.value_bytes / elem_size;
    for i in 0..n {
        let src = vref.value_off + i * elem_size;
        let dst = (i * elem_size) as usize;
        match elem_size {
            2 => {
                let v = cfg.read_u16(bytes, src)?;
                arena.span_mut(span)[dst..dst + 2].copy_from_slice(&v.to_le_bytes());
            }
            4 => {
                let v = cfg.read_u32(bytes, src)?;
                arena.span_mut(span)[dst..dst + 4].copy_from_slice(&v.to_le_bytes());
            }
            8 => {
                let v = cfg.read_u64(bytes, src)?;
                arena.span_mut(span)[dst..dst + 8].copy_from_slice(&v.to_le_bytes());
            }
            _ => return None,
        }
    }
    Some(span)
}

/// Plain byte array copy (BYTE / SBYTE).
fn copy_array(arena: &mut ByteArena, window: &[u8], elem: ElemType) -> Option<MetaValue> {
    let span = arena.intern(window)?;
    Some(MetaValue::array(elem, span.len(), span))
}

/// Intern character data with trailing NULs trimmed; all-NUL payloads
/// yield an empty value so fixed-field builders skip them.
pub(crate) fn intern_trimmed_text(
    arena: &mut ByteArena,
    raw: &[u8],
    encoding: TextEncoding,
) -> Option<MetaValue> {
    let end = raw.iter().rposition(|&b| b != 0).map_or(0, |p| p + 1);
    if end == 0 {
        return Some(MetaValue::empty());
    }
    let span = arena.intern(&raw[..end])?;
    Some(MetaValue::text(span, encoding))
}

/// Fixed-width ASCII field from a vendor table: NUL-trimmed text value.
pub(crate) fn make_fixed_ascii_text(arena: &mut ByteArena, raw: &[u8]) -> MetaValue {
    intern_trimmed_text(arena, raw, TextEncoding::Ascii).unwrap_or(MetaValue::empty())
}

/// Deterministic IFD token for a vendor subtable, so the same logical
/// subdirectory always maps to the same name.
pub(crate) fn make_mk_subtable_ifd_token(prefix: &str, subtable: &str, index: u32) -> String {
    format!("{prefix}_{subtable}_{index}")
}

/// Emit one entry under `block`. The store add never fails; limit checks
/// happen before calling this.
#[allow(clippy::too_many_arguments)]
pub(crate) fn emit_entry(
    store: &mut MetaStore,
    ifd_token: ByteSpan,
    tag: u16,
    value: MetaValue,
    block: BlockId,
    order: u32,
    wire: WireType,
    wire_count: u32,
    flags: EntryFlags,
    result: &mut ExifDecodeResult,
) {
    store.add_entry(Entry {
        key: MetaKey::ExifTag { ifd: ifd_token, tag },
        value,
        origin: EntryOrigin { block, order_in_block: order, wire, wire_count },
        flags,
    });
    result.entries_emitted += 1;
}

/// Outcome of decoding one directory.
#[derive(Debug, Clone, Copy)]
pub(crate) struct IfdOutcome {
    pub block: BlockId,
    pub token: ByteSpan,
    pub next_ifd: u64,
    pub emitted: u32,
}

/// Decode one IFD with no header: emit every decodable entry into a new
/// block and hand each raw entry to `on_entry` for recursion hooks.
///
/// Shared by the main EXIF walker and every classic-IFD MakerNote decoder;
/// the vendor differences live entirely in `cfg` and `policy`.
#[allow(clippy::too_many_arguments)]
pub(crate) fn decode_ifd_no_header(
    cfg: TiffConfig,
    bytes: &[u8],
    ifd_off: u64,
    ifd_name: &str,
    parent: BlockId,
    policy: OffsetPolicy,
    extra_flags: EntryFlags,
    store: &mut MetaStore,
    options: &ExifDecodeOptions,
    result: &mut ExifDecodeResult,
    mut on_entry: impl FnMut(&RawIfdEntry, &IfdValueRef),
) -> Option<IfdOutcome> {
    let limits = &options.limits;
    if !result.ifd_budget_left(limits) {
        result.update(DecodeStatus::LimitExceeded);
        return None;
    }
    let Some(mut entry_count) = read_ifd_entry_count(cfg, bytes, ifd_off) else {
        result.update(DecodeStatus::Malformed);
        return None;
    };
    if entry_count > u64::from(limits.max_entries_per_ifd) {
        result.update(DecodeStatus::LimitExceeded);
        entry_count = u64::from(limits.max_entries_per_ifd);
    }

    let token = match store.arena_mut().intern(ifd_name.as_bytes()) {
        Some(t) => t,
        None => return None,
    };
    let block = store.add_block(openmeta_core::BlockInfo {
        token,
        parent,
        wire_offset: ifd_off,
        derived: extra_flags.contains(EntryFlags::DERIVED),
    });
    if !block.is_valid() {
        return None;
    }
    result.ifds_walked += 1;

    let entries_off = ifd_entries_off(cfg, ifd_off);
    let entry_size = ifd_entry_size(cfg);
    let mut emitted = 0u32;

    for i in 0..entry_count {
        let entry_off = entries_off + i * entry_size;
        let Some(raw) = read_ifd_entry(cfg, bytes, entry_off) else {
            result.update(DecodeStatus::Malformed);
            break;
        };
        let Some(wire_type) = TiffType::from_u16(raw.wire_type) else {
            debug!(tag = raw.tag, wire_type = raw.wire_type, "skipping unknown wire type");
            result.update(DecodeStatus::Malformed);
            continue;
        };
        let Some(vref) = resolve_value_ref(cfg, &raw, policy) else {
            result.update(DecodeStatus::Malformed);
            continue;
        };
        if !result.entry_budget_left(limits) {
            result.update(DecodeStatus::LimitExceeded);
            break;
        }

        let (value, value_flags) =
            decode_tiff_value(cfg, bytes, wire_type, raw.count, vref, store.arena_mut(), limits);
        if value_flags.contains(EntryFlags::UNREADABLE) {
            result.update(DecodeStatus::Malformed);
        } else if value_flags.contains(EntryFlags::TRUNCATED) {
            result.update(DecodeStatus::LimitExceeded);
        }
        emit_entry(
            store,
            token,
            raw.tag,
            value,
            block,
            i as u32,
            WireType::tiff(raw.wire_type),
            raw.count as u32,
            extra_flags | value_flags,
            result,
        );
        emitted += 1;
        on_entry(&raw, &vref);
    }

    let tail = entries_off + entry_count * entry_size;
    let next_ifd = cfg.read_offset(bytes, tail).unwrap_or(0);
    Some(IfdOutcome { block, token, next_ifd, emitted })
}

/// Batch-emit a flat `(tag, value)` list into a new derived block.
pub(crate) fn emit_bin_dir_entries(
    ifd_name: &str,
    store: &mut MetaStore,
    tags: &[u16],
    values: &[MetaValue],
    limits: &ExifDecodeLimits,
    result: &mut ExifDecodeResult,
) {
    debug_assert_eq!(tags.len(), values.len());
    let Some(token) = store.arena_mut().intern(ifd_name.as_bytes()) else {
        return;
    };
    let block = store.add_block(openmeta_core::BlockInfo {
        token,
        parent: BlockId::INVALID,
        wire_offset: 0,
        derived: true,
    });
    if !block.is_valid() {
        return;
    }
    for (i, (&tag, value)) in tags.iter().zip(values).enumerate() {
        if !result.entry_budget_left(limits) {
            result.update(DecodeStatus::LimitExceeded);
            break;
        }
        emit_entry(
            store,
            token,
            tag,
            *value,
            block,
            i as u32,
            wire_for_value(value),
            value.count,
            EntryFlags::DERIVED,
            result,
        );
    }
}

/// Vendor wire code recorded for derived fixed-layout fields, mapped from
/// the element type using TIFF codes for familiarity.
fn wire_for_value(value: &MetaValue) -> WireType {
    let code = match (value.kind, value.elem) {
        (ValueKind::Text, _) => 2,
        (ValueKind::Bytes, _) => 7,
        (_, ElemType::U8) => 1,
        (_, ElemType::U16) => 3,
        (_, ElemType::U32) => 4,
        (_, ElemType::URational) => 5,
        (_, ElemType::I8) => 6,
        (_, ElemType::I16) => 8,
        (_, ElemType::I32) => 9,
        (_, ElemType::SRational) => 10,
        (_, ElemType::F32) => 11,
        (_, ElemType::F64) => 12,
        (_, ElemType::U64) => 16,
        (_, ElemType::I64) => 17,
    };
    WireType::vendor(code)
}

/// Scored classic-IFD candidate, used to pick endianness and start offset
/// for headerless vendor notes.
#[derive(Debug, Clone, Copy, Default)]
pub(crate) struct ClassicIfdCandidate {
    pub offset: u64,
    pub le: bool,
    pub entry_count: u16,
    pub valid_entries: u32,
}

/// Score the IFD at `ifd_off`: count entries with a known type, a sane
/// count, and an out-of-line extent inside the window.
pub(crate) fn score_classic_ifd_candidate(
    cfg: TiffConfig,
    bytes: &[u8],
    ifd_off: u64,
    limits: &ExifDecodeLimits,
) -> Option<ClassicIfdCandidate> {
    let entry_count = cfg.read_u16(bytes, ifd_off)?;
    if entry_count == 0 || u32::from(entry_count) > limits.max_entries_per_ifd {
        return None;
    }
    let mut valid = 0u32;
    for i in 0..u64::from(entry_count) {
        let entry_off = ifd_off + 2 + i * 12;
        let Some(raw) = read_ifd_entry(cfg, bytes, entry_off) else {
            break;
        };
        let Some(value_bytes) = entry_value_bytes(&raw) else {
            continue;
        };
        if raw.count == 0 || value_bytes > u64::from(limits.max_value_bytes) {
            continue;
        }
        if value_bytes > 4 {
            let end = raw.value_or_off.checked_add(value_bytes);
            if end.is_none_or(|e| e > bytes.len() as u64) {
                continue;
            }
        }
        valid += 1;
    }
    Some(ClassicIfdCandidate { offset: ifd_off, le: cfg.byte_order.is_le(), entry_count, valid_entries: valid })
}

/// Scored search over starting offsets and both endiannesses; best strictly
/// greater score wins, so earlier offsets and little-endian break ties.
pub(crate) fn find_best_classic_ifd_candidate(
    bytes: &[u8],
    scan_bytes: u64,
    limits: &ExifDecodeLimits,
) -> Option<ClassicIfdCandidate> {
    let mut best: Option<ClassicIfdCandidate> = None;
    for off in 0..scan_bytes {
        for le in [true, false] {
            let order = if le {
                openmeta_core::ByteOrder::LittleEndian
            } else {
                openmeta_core::ByteOrder::BigEndian
            };
            let Some(candidate) =
                score_classic_ifd_candidate(TiffConfig::classic(order), bytes, off, limits)
            else {
                continue;
            };
            if candidate.valid_entries > 0
                && best.is_none_or(|b| candidate.valid_entries > b.valid_entries)
            {
                best = Some(candidate);
            }
        }
    }
    best
}

/// Quick plausibility check used before committing to a vendor layout.
pub(crate) fn looks_like_classic_ifd(
    cfg: TiffConfig,
    bytes: &[u8],
    ifd_off: u64,
    limits: &ExifDecodeLimits,
) -> bool {
    match score_classic_ifd_candidate(cfg, bytes, ifd_off, limits) {
        Some(c) => c.valid_entries * 2 >= u32::from(c.entry_count),
        None => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use openmeta_core::ByteOrder;

    /// Build a little-endian classic IFD with the given raw entries.
    fn ifd_le(entries: &[(u16, u16, u32, u32)], tail: &[u8]) -> Vec<u8> {
        let mut data = (entries.len() as u16).to_le_bytes().to_vec();
        for &(tag, wire_type, count, value) in entries {
            data.extend_from_slice(&tag.to_le_bytes());
            data.extend_from_slice(&wire_type.to_le_bytes());
            data.extend_from_slice(&count.to_le_bytes());
            data.extend_from_slice(&value.to_le_bytes());
        }
        data.extend_from_slice(&0u32.to_le_bytes()); // next IFD
        data.extend_from_slice(tail);
        data
    }

    #[test]
    fn decode_inline_and_out_of_line() {
        // SHORT[1] inline, ASCII[6] at offset 30.
        let data = ifd_le(
            &[(0x0112, 3, 1, 6), (0x010F, 2, 6, 30)],
            b"Canon\x00",
        );
        assert_eq!(data.len(), 36);

        let cfg = TiffConfig::classic(ByteOrder::LittleEndian);
        let mut store = MetaStore::new();
        let options = ExifDecodeOptions::default();
        let mut result = ExifDecodeResult::default();
        let outcome = decode_ifd_no_header(
            cfg,
            &data,
            0,
            "ifd0",
            BlockId::INVALID,
            OffsetPolicy::absolute(),
            EntryFlags::NONE,
            &mut store,
            &options,
            &mut result,
            |_, _| {},
        )
        .unwrap();

        assert_eq!(outcome.emitted, 2);
        assert_eq!(result.status, DecodeStatus::Ok);
        let entries: Vec<_> = store.iter().map(|(_, e)| *e).collect();
        assert_eq!(entries[0].value.as_u32(), Some(6));
        let span = entries[1].value.span().unwrap();
        assert_eq!(store.arena().span(span), b"Canon");
    }

    #[test]
    fn unknown_type_is_skipped_not_fatal() {
        let data = ifd_le(&[(0x0001, 0x00FE, 1, 0), (0x0002, 3, 1, 7)], b"");
        let cfg = TiffConfig::classic(ByteOrder::LittleEndian);
        let mut store = MetaStore::new();
        let options = ExifDecodeOptions::default();
        let mut result = ExifDecodeResult::default();
        let outcome = decode_ifd_no_header(
            cfg,
            &data,
            0,
            "ifd0",
            BlockId::INVALID,
            OffsetPolicy::absolute(),
            EntryFlags::NONE,
            &mut store,
            &options,
            &mut result,
            |_, _| {},
        )
        .unwrap();
        assert_eq!(outcome.emitted, 1);
        assert_eq!(result.status, DecodeStatus::Malformed);
    }

    #[test]
    fn clipped_value_window_flags_unreadable() {
        // LONG[4] whose offset points past the stream end.
        let data = ifd_le(&[(0x0111, 4, 4, 0x4000)], b"");
        let cfg = TiffConfig::classic(ByteOrder::LittleEndian);
        let mut store = MetaStore::new();
        let options = ExifDecodeOptions::default();
        let mut result = ExifDecodeResult::default();
        decode_ifd_no_header(
            cfg,
            &data,
            0,
            "ifd0",
            BlockId::INVALID,
            OffsetPolicy::absolute(),
            EntryFlags::NONE,
            &mut store,
            &options,
            &mut result,
            |_, _| {},
        )
        .unwrap();
        let entry = store.entries()[0];
        assert!(entry.flags.contains(EntryFlags::UNREADABLE));
        assert!(entry.value.is_empty());
        assert_eq!(result.status, DecodeStatus::Malformed);
    }

    #[test]
    fn negative_policy_base_resolves() {
        let policy = OffsetPolicy::with_base(-8);
        assert_eq!(policy.resolve(16), Some(8));
        assert_eq!(policy.resolve(4), None);
    }

    #[test]
    fn candidate_scoring_prefers_denser_ifd() {
        // Two valid inline SHORT entries.
        let good = ifd_le(&[(1, 3, 1, 1), (2, 3, 1, 2)], b"");
        let limits = ExifDecodeLimits::default();
        let best = find_best_classic_ifd_candidate(&good, 4, &limits).unwrap();
        assert_eq!(best.offset, 0);
        assert!(best.le);
        assert_eq!(best.valid_entries, 2);
    }

    #[test]
    fn be_array_normalizes_to_le() {
        // Big-endian SHORT[3] out of line.
        let mut data = 1u16.to_be_bytes().to_vec();
        data.extend_from_slice(&0x0101u16.to_be_bytes());
        data.extend_from_slice(&3u16.to_be_bytes());
        data.extend_from_slice(&3u32.to_be_bytes());
        data.extend_from_slice(&18u32.to_be_bytes());
        data.extend_from_slice(&0u32.to_be_bytes());
        data.extend_from_slice(&[0x01, 0x02, 0x03, 0x04, 0x05, 0x06]);

        let cfg = TiffConfig::classic(ByteOrder::BigEndian);
        let mut store = MetaStore::new();
        let options = ExifDecodeOptions::default();
        let mut result = ExifDecodeResult::default();
        decode_ifd_no_header(
            cfg,
            &data,
            0,
            "ifd0",
            BlockId::INVALID,
            OffsetPolicy::absolute(),
            EntryFlags::NONE,
            &mut store,
            &options,
            &mut result,
            |_, _| {},
        )
        .unwrap();

        let entry = store.entries()[0];
        assert_eq!(entry.value.array_u64(store.arena(), 0), Some(0x0102));
        assert_eq!(entry.value.array_u64(store.arena(), 2), Some(0x0506));
    }
}
