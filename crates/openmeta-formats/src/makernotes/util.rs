//! Shared helpers for vendor MakerNote decoders.
//!
//! Vendor notes mix three wire shapes: classic IFDs (handled by
//! [`crate::exif::classic`]), fixed-layout blobs where the tag id doubles as
//! the byte offset, and flat scalar tables where the tag id is the element
//! index. The readers here are all total: out-of-bounds fields yield an
//! empty value, which [`TagListBuilder::push`] silently drops.

use openmeta_core::{
    reader, BlockId, BlockInfo, ByteArena, ByteOrder, DecodeStatus, ElemType, Entry, EntryFlags,
    EntryOrigin, MetaKey, MetaStore, MetaValue, TextEncoding, WireType,
};

use crate::exif::{ExifDecodeOptions, ExifDecodeResult};

/// Single rational stored in the arena as little-endian (num, den).
pub(crate) fn make_urational(arena: &mut ByteArena, num: u32, den: u32) -> MetaValue {
    let mut buf = [0u8; 8];
    buf[..4].copy_from_slice(&num.to_le_bytes());
    buf[4..].copy_from_slice(&den.to_le_bytes());
    match arena.intern(&buf) {
        Some(span) => MetaValue::rational(span, false),
        None => MetaValue::empty(),
    }
}

/// u8 field at `off`.
pub(crate) fn u8_value(bytes: &[u8], off: u64) -> MetaValue {
    match reader::read_u8(bytes, off) {
        Some(v) => MetaValue::u8(v),
        None => MetaValue::empty(),
    }
}

/// u16 field at `off`.
pub(crate) fn u16_value(bytes: &[u8], off: u64, order: ByteOrder) -> MetaValue {
    match reader::read_u16(bytes, off, order) {
        Some(v) => MetaValue::u16(v),
        None => MetaValue::empty(),
    }
}

/// i16 field at `off`.
pub(crate) fn i16_value(bytes: &[u8], off: u64, order: ByteOrder) -> MetaValue {
    match reader::read_i16(bytes, off, order) {
        Some(v) => MetaValue::i16(v),
        None => MetaValue::empty(),
    }
}

/// u32 field at `off`.
pub(crate) fn u32_value(bytes: &[u8], off: u64, order: ByteOrder) -> MetaValue {
    match reader::read_u32(bytes, off, order) {
        Some(v) => MetaValue::u32(v),
        None => MetaValue::empty(),
    }
}

/// f32 field at `off`.
pub(crate) fn f32_value(bytes: &[u8], off: u64, order: ByteOrder) -> MetaValue {
    match reader::read_f32(bytes, off, order) {
        Some(v) => MetaValue::f32(v),
        None => MetaValue::empty(),
    }
}

/// Fixed-width ASCII field, trailing NULs trimmed.
pub(crate) fn ascii_text(arena: &mut ByteArena, bytes: &[u8], off: u64, n: u64) -> MetaValue {
    let Some(window) = bounded_window(bytes, off, n) else {
        return MetaValue::empty();
    };
    crate::exif::classic::make_fixed_ascii_text(arena, window)
}

/// UTF-16LE field kept as raw bytes with the encoding recorded.
pub(crate) fn utf16le_text(arena: &mut ByteArena, bytes: &[u8], off: u64, n: u64) -> MetaValue {
    let Some(window) = reader::window(bytes, off, n) else {
        return MetaValue::empty();
    };
    let end = window.rchunks_exact(2).take_while(|c| c == &[0, 0]).count();
    let trimmed = &window[..window.len() - end * 2];
    if trimmed.is_empty() {
        return MetaValue::empty();
    }
    match arena.intern(trimmed) {
        Some(span) => MetaValue::text(span, TextEncoding::Utf16Le),
        None => MetaValue::empty(),
    }
}

/// Raw byte window as a Bytes value.
pub(crate) fn bytes_value(arena: &mut ByteArena, bytes: &[u8], off: u64, n: u64) -> MetaValue {
    let Some(window) = bounded_window(bytes, off, n) else {
        return MetaValue::empty();
    };
    match arena.intern(window) {
        Some(span) => MetaValue::bytes(span),
        None => MetaValue::empty(),
    }
}

/// u8[n] array.
pub(crate) fn u8_array(arena: &mut ByteArena, bytes: &[u8], off: u64, n: u64) -> MetaValue {
    let Some(window) = bounded_window(bytes, off, n) else {
        return MetaValue::empty();
    };
    match arena.intern(window) {
        Some(span) => MetaValue::array(ElemType::U8, span.len(), span),
        None => MetaValue::empty(),
    }
}

/// u16[count] array, normalised to the store's little-endian layout.
pub(crate) fn u16_array(
    arena: &mut ByteArena,
    bytes: &[u8],
    off: u64,
    count: u32,
    order: ByteOrder,
) -> MetaValue {
    let n_bytes = u64::from(count) * 2;
    if reader::window(bytes, off, n_bytes).is_none() {
        return MetaValue::empty();
    }
    let Some(span) = arena.allocate(count * 2, 1) else {
        return MetaValue::empty();
    };
    for i in 0..u64::from(count) {
        let v = reader::read_u16(bytes, off + i * 2, order).unwrap_or(0);
        let dst = (i * 2) as usize;
        arena.span_mut(span)[dst..dst + 2].copy_from_slice(&v.to_le_bytes());
    }
    MetaValue::array(ElemType::U16, count, span)
}

/// u8 array built from already-decoded values.
pub(crate) fn u8_array_from(arena: &mut ByteArena, values: &[u8]) -> MetaValue {
    match arena.intern(values) {
        Some(span) => MetaValue::array(ElemType::U8, span.len(), span),
        None => MetaValue::empty(),
    }
}

/// u16 array built from already-decoded values.
pub(crate) fn u16_slice_value(arena: &mut ByteArena, values: &[u16]) -> MetaValue {
    let Some(span) = arena.allocate(values.len() as u32 * 2, 1) else {
        return MetaValue::empty();
    };
    for (i, v) in values.iter().enumerate() {
        arena.span_mut(span)[i * 2..i * 2 + 2].copy_from_slice(&v.to_le_bytes());
    }
    MetaValue::array(ElemType::U16, values.len() as u32, span)
}

/// i16 array built from already-decoded values.
pub(crate) fn i16_slice_value(arena: &mut ByteArena, values: &[i16]) -> MetaValue {
    let Some(span) = arena.allocate(values.len() as u32 * 2, 1) else {
        return MetaValue::empty();
    };
    for (i, v) in values.iter().enumerate() {
        arena.span_mut(span)[i * 2..i * 2 + 2].copy_from_slice(&v.to_le_bytes());
    }
    MetaValue::array(ElemType::I16, values.len() as u32, span)
}

fn bounded_window(bytes: &[u8], off: u64, n: u64) -> Option<&[u8]> {
    if n == 0 {
        return None;
    }
    // Clamp to the available tail so fixed-layout blobs shorter than the
    // declared field still yield their leading bytes.
    let avail = (bytes.len() as u64).checked_sub(off)?;
    reader::window(bytes, off, n.min(avail))
}

/// Accumulates `(tag, value)` pairs for one derived block, dropping empty
/// values, then batch-emits.
#[derive(Debug, Default)]
pub(crate) struct TagListBuilder {
    tags: Vec<u16>,
    values: Vec<MetaValue>,
}

impl TagListBuilder {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Keep `(tag, value)` unless the value is empty.
    pub(crate) fn push(&mut self, tag: u16, value: MetaValue) {
        if !value.is_empty() {
            self.tags.push(tag);
            self.values.push(value);
        }
    }

    pub(crate) fn is_empty(&self) -> bool {
        self.tags.is_empty()
    }

    /// Emit everything into a new derived block named `ifd_name`.
    pub(crate) fn emit(
        self,
        ifd_name: &str,
        store: &mut MetaStore,
        options: &ExifDecodeOptions,
        result: &mut ExifDecodeResult,
    ) -> bool {
        if self.is_empty() {
            return false;
        }
        crate::exif::classic::emit_bin_dir_entries(
            ifd_name,
            store,
            &self.tags,
            &self.values,
            &options.limits,
            result,
        );
        true
    }
}

/// Element width of a flat scalar table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum TableElem {
    U8,
    U16,
    I16,
    U32,
    I32,
}

impl TableElem {
    fn size(self) -> usize {
        match self {
            TableElem::U8 => 1,
            TableElem::U16 | TableElem::I16 => 2,
            TableElem::U32 | TableElem::I32 => 4,
        }
    }

    fn wire(self) -> WireType {
        match self {
            TableElem::U8 => WireType::vendor(1),
            TableElem::U16 => WireType::vendor(3),
            TableElem::I16 => WireType::vendor(8),
            TableElem::U32 => WireType::vendor(4),
            TableElem::I32 => WireType::vendor(9),
        }
    }
}

/// Emit a flat scalar table as a derived block: the tag id of each entry is
/// its element index.
///
/// `raw` must already be a stable copy; callers slice it out of the arena
/// with [`entry_bytes_copy`] before emitting, because appending entries can
/// grow the arena under the source span.
pub(crate) fn emit_scalar_table(
    ifd_name: &str,
    raw: &[u8],
    elem: TableElem,
    order: ByteOrder,
    store: &mut MetaStore,
    options: &ExifDecodeOptions,
    result: &mut ExifDecodeResult,
) {
    let limits = &options.limits;
    if raw.is_empty() || raw.len() as u64 > u64::from(limits.max_value_bytes) {
        if !raw.is_empty() {
            result.update(DecodeStatus::LimitExceeded);
        }
        return;
    }
    let count = raw.len() / elem.size();
    if count == 0 {
        return;
    }
    if count as u32 > limits.max_entries_per_ifd {
        result.update(DecodeStatus::LimitExceeded);
        return;
    }

    let Some(token) = store.arena_mut().intern(ifd_name.as_bytes()) else {
        return;
    };
    let block = store.add_block(BlockInfo {
        token,
        parent: BlockId::INVALID,
        wire_offset: 0,
        derived: true,
    });
    if !block.is_valid() {
        return;
    }

    for i in 0..count.min(0x1_0000) {
        if !result.entry_budget_left(limits) {
            result.update(DecodeStatus::LimitExceeded);
            return;
        }
        let off = (i * elem.size()) as u64;
        let value = match elem {
            TableElem::U8 => u8_value(raw, off),
            TableElem::U16 => u16_value(raw, off, order),
            TableElem::I16 => i16_value(raw, off, order),
            TableElem::U32 => u32_value(raw, off, order),
            TableElem::I32 => match reader::read_i32(raw, off, order) {
                Some(v) => MetaValue::i32(v),
                None => MetaValue::empty(),
            },
        };
        store.add_entry(Entry {
            key: MetaKey::ExifTag { ifd: token, tag: i as u16 },
            value,
            origin: EntryOrigin {
                block,
                order_in_block: i as u32,
                wire: elem.wire(),
                wire_count: 1,
            },
            flags: EntryFlags::DERIVED,
        });
        result.entries_emitted += 1;
    }
}

/// Copy the payload bytes of the first `(ifd, tag)` entry out of the arena.
///
/// The copy is the arena-growth invariant in action: post-passes reinterpret
/// entries they just emitted, and the derived entries they add may grow the
/// arena under any live span reference.
pub(crate) fn entry_bytes_copy(store: &MetaStore, ifd: &str, tag: u16) -> Option<Vec<u8>> {
    let entry = store.entries().iter().find(|e| match e.key {
        MetaKey::ExifTag { ifd: token, tag: t } => {
            t == tag && store.arena().span(token) == ifd.as_bytes()
        }
        _ => false,
    })?;
    let span = entry.value.span()?;
    let bytes = store.arena().span(span);
    if bytes.is_empty() {
        return None;
    }
    Some(bytes.to_vec())
}

#[cfg(test)]
mod tests {
    use super::*;
    use openmeta_core::ValueKind;

    #[test]
    fn out_of_bounds_fields_are_empty() {
        let data = [0u8; 4];
        assert!(u16_value(&data, 10, ByteOrder::LittleEndian).is_empty());
        assert!(u32_value(&data, 2, ByteOrder::LittleEndian).is_empty());
        let mut arena = ByteArena::new();
        assert!(ascii_text(&mut arena, &data, 10, 4).is_empty());
    }

    #[test]
    fn scalar_table_uses_index_as_tag() {
        let raw = [0x01, 0x00, 0x02, 0x00, 0x03, 0x00];
        let mut store = MetaStore::new();
        let options = ExifDecodeOptions::default();
        let mut result = ExifDecodeResult::default();
        emit_scalar_table(
            "mk_test_table_0",
            &raw,
            TableElem::U16,
            ByteOrder::LittleEndian,
            &mut store,
            &options,
            &mut result,
        );
        assert_eq!(result.entries_emitted, 3);
        let entries = store.entries();
        assert_eq!(entries[0].key.exif_tag(), Some(0));
        assert_eq!(entries[2].key.exif_tag(), Some(2));
        assert_eq!(entries[2].value.as_u32(), Some(3));
        assert!(entries[0].flags.contains(EntryFlags::DERIVED));
    }

    #[test]
    fn urational_round_trips() {
        let mut arena = ByteArena::new();
        let v = make_urational(&mut arena, 355, 113);
        assert_eq!(v.kind, ValueKind::Rational);
        let span = v.span().unwrap();
        let bytes = arena.span(span);
        assert_eq!(u32::from_le_bytes(bytes[..4].try_into().unwrap()), 355);
        assert_eq!(u32::from_le_bytes(bytes[4..].try_into().unwrap()), 113);
    }
}
