//! Decoded metadata values.
//!
//! A [`MetaValue`] is the uniform in-memory form every decoder emits:
//! scalars are carried inline, everything variable-length lives in the
//! store's [`ByteArena`](crate::ByteArena) behind a span handle.

use crate::{ByteArena, ByteOrder, ByteSpan};

/// Unsigned rational number (numerator/denominator).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[must_use]
pub struct URational {
    pub num: u32,
    pub den: u32,
}

impl URational {
    pub const fn new(num: u32, den: u32) -> Self {
        Self { num, den }
    }

    /// Convert to f64, returning 0.0 if denominator is zero.
    pub fn to_f64(self) -> f64 {
        if self.den == 0 {
            0.0
        } else {
            self.num as f64 / self.den as f64
        }
    }
}

impl std::fmt::Display for URational {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}/{}", self.num, self.den)
    }
}

/// Signed rational number (numerator/denominator).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[must_use]
pub struct SRational {
    pub num: i32,
    pub den: i32,
}

impl SRational {
    pub const fn new(num: i32, den: i32) -> Self {
        Self { num, den }
    }

    /// Convert to f64, returning 0.0 if denominator is zero.
    pub fn to_f64(self) -> f64 {
        if self.den == 0 {
            0.0
        } else {
            self.num as f64 / self.den as f64
        }
    }
}

impl std::fmt::Display for SRational {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}/{}", self.num, self.den)
    }
}

/// Coarse shape of a value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValueKind {
    /// No payload (unreadable or truncated entries keep their key).
    Empty,
    /// One numeric element, stored inline.
    Scalar,
    /// `count` numeric elements in the arena.
    Array,
    /// Raw bytes in the arena (UNDEFINED and vendor blobs).
    Bytes,
    /// Character data in the arena, trailing NULs trimmed.
    Text,
    /// `count` rational pairs in the arena.
    Rational,
}

/// Element type of scalar/array payloads.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ElemType {
    U8,
    U16,
    U32,
    U64,
    I8,
    I16,
    I32,
    I64,
    F32,
    F64,
    URational,
    SRational,
}

impl ElemType {
    /// Size of one element in bytes as stored in the arena.
    #[inline]
    pub const fn size(self) -> u32 {
        match self {
            ElemType::U8 | ElemType::I8 => 1,
            ElemType::U16 | ElemType::I16 => 2,
            ElemType::U32 | ElemType::I32 | ElemType::F32 => 4,
            ElemType::U64
            | ElemType::I64
            | ElemType::F64
            | ElemType::URational
            | ElemType::SRational => 8,
        }
    }
}

/// Character encoding recorded for [`ValueKind::Text`] payloads.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TextEncoding {
    Ascii,
    Utf8,
    /// UTF-16 little-endian, kept as raw bytes (Reconyx serial numbers).
    Utf16Le,
    /// Unknown or vendor-declared encoding left as raw bytes.
    Unknown,
}

/// Payload location: inline word or arena span.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValueData {
    /// Raw 64-bit pattern of an inline scalar.
    Inline(u64),
    /// Arena-resident payload.
    Span(ByteSpan),
}

/// Uniform decoded value.
#[derive(Debug, Clone, Copy, PartialEq)]
#[must_use]
pub struct MetaValue {
    pub kind: ValueKind,
    pub elem: ElemType,
    pub count: u32,
    pub data: ValueData,
    pub encoding: TextEncoding,
}

impl MetaValue {
    /// Value with no payload.
    pub const fn empty() -> Self {
        Self {
            kind: ValueKind::Empty,
            elem: ElemType::U8,
            count: 0,
            data: ValueData::Inline(0),
            encoding: TextEncoding::Unknown,
        }
    }

    /// Inline unsigned scalar.
    pub const fn scalar_u64(elem: ElemType, bits: u64) -> Self {
        Self {
            kind: ValueKind::Scalar,
            elem,
            count: 1,
            data: ValueData::Inline(bits),
            encoding: TextEncoding::Unknown,
        }
    }

    /// Inline u8 scalar.
    pub const fn u8(v: u8) -> Self {
        Self::scalar_u64(ElemType::U8, v as u64)
    }

    /// Inline u16 scalar.
    pub const fn u16(v: u16) -> Self {
        Self::scalar_u64(ElemType::U16, v as u64)
    }

    /// Inline u32 scalar.
    pub const fn u32(v: u32) -> Self {
        Self::scalar_u64(ElemType::U32, v as u64)
    }

    /// Inline u64 scalar.
    pub const fn u64(v: u64) -> Self {
        Self::scalar_u64(ElemType::U64, v)
    }

    /// Inline i16 scalar (sign pattern widened to 64 bits).
    pub const fn i16(v: i16) -> Self {
        Self::scalar_u64(ElemType::I16, v as i64 as u64)
    }

    /// Inline i32 scalar.
    pub const fn i32(v: i32) -> Self {
        Self::scalar_u64(ElemType::I32, v as i64 as u64)
    }

    /// Inline f32 scalar.
    pub const fn f32(v: f32) -> Self {
        Self::scalar_u64(ElemType::F32, v.to_bits() as u64)
    }

    /// Inline f64 scalar.
    pub const fn f64(v: f64) -> Self {
        Self::scalar_u64(ElemType::F64, v.to_bits())
    }

    /// Single rational stored in the arena (8 bytes: num, den).
    pub fn rational(span: ByteSpan, signed: bool) -> Self {
        Self {
            kind: ValueKind::Rational,
            elem: if signed { ElemType::SRational } else { ElemType::URational },
            count: span.len() / 8,
            data: ValueData::Span(span),
            encoding: TextEncoding::Unknown,
        }
    }

    /// Numeric array in the arena. `span.len()` must equal
    /// `count * elem.size()`.
    pub fn array(elem: ElemType, count: u32, span: ByteSpan) -> Self {
        Self {
            kind: ValueKind::Array,
            elem,
            count,
            data: ValueData::Span(span),
            encoding: TextEncoding::Unknown,
        }
    }

    /// Raw byte payload in the arena.
    pub fn bytes(span: ByteSpan) -> Self {
        Self {
            kind: ValueKind::Bytes,
            elem: ElemType::U8,
            count: span.len(),
            data: ValueData::Span(span),
            encoding: TextEncoding::Unknown,
        }
    }

    /// Character payload in the arena.
    pub fn text(span: ByteSpan, encoding: TextEncoding) -> Self {
        Self {
            kind: ValueKind::Text,
            elem: ElemType::U8,
            count: span.len(),
            data: ValueData::Span(span),
            encoding,
        }
    }

    /// True when the value carries no payload.
    pub fn is_empty(&self) -> bool {
        matches!(self.kind, ValueKind::Empty)
    }

    /// Arena span of the payload, if any.
    pub fn span(&self) -> Option<ByteSpan> {
        match self.data {
            ValueData::Span(s) => Some(s),
            ValueData::Inline(_) => None,
        }
    }

    /// Inline scalar as u64, if this is a scalar.
    pub fn as_u64(&self) -> Option<u64> {
        match (self.kind, self.data) {
            (ValueKind::Scalar, ValueData::Inline(bits)) => Some(bits),
            _ => None,
        }
    }

    /// Inline scalar as u32, if it fits.
    pub fn as_u32(&self) -> Option<u32> {
        self.as_u64().and_then(|v| u32::try_from(v).ok())
    }

    /// Inline scalar reinterpreted as i64 per its element type.
    pub fn as_i64(&self) -> Option<i64> {
        let bits = self.as_u64()?;
        Some(match self.elem {
            ElemType::I8 => bits as u8 as i8 as i64,
            ElemType::I16 => bits as u16 as i16 as i64,
            ElemType::I32 => bits as u32 as i32 as i64,
            _ => bits as i64,
        })
    }

    /// Inline scalar as f64 (floats only).
    pub fn as_f64(&self) -> Option<f64> {
        let bits = self.as_u64()?;
        match self.elem {
            ElemType::F32 => Some(f32::from_bits(bits as u32) as f64),
            ElemType::F64 => Some(f64::from_bits(bits)),
            _ => None,
        }
    }

    /// Render an inline scalar for humans.
    pub fn format_simple(&self) -> String {
        match self.elem {
            ElemType::I8 | ElemType::I16 | ElemType::I32 | ElemType::I64 => {
                self.as_i64().map_or_else(|| "?".to_string(), |v| v.to_string())
            }
            ElemType::F32 | ElemType::F64 => {
                self.as_f64().map_or_else(|| "?".to_string(), |v| v.to_string())
            }
            _ => self.as_u64().map_or_else(|| "?".to_string(), |v| v.to_string()),
        }
    }

    /// Render array/rational element `i` for humans.
    pub fn format_element(&self, arena: &ByteArena, i: u32) -> String {
        match self.elem {
            ElemType::URational | ElemType::SRational => {
                let Some(span) = self.span() else {
                    return "?".to_string();
                };
                let bytes = arena.span(span);
                let off = (i as usize) * 8;
                let Some(pair) = bytes.get(off..off + 8) else {
                    return "?".to_string();
                };
                let num = u32::from_le_bytes([pair[0], pair[1], pair[2], pair[3]]);
                let den = u32::from_le_bytes([pair[4], pair[5], pair[6], pair[7]]);
                if self.elem == ElemType::SRational {
                    format!("{}", SRational::new(num as i32, den as i32))
                } else {
                    format!("{}", URational::new(num, den))
                }
            }
            ElemType::I8 | ElemType::I16 | ElemType::I32 | ElemType::I64 => {
                match self.array_u64(arena, i) {
                    Some(bits) => {
                        let v = match self.elem {
                            ElemType::I8 => bits as u8 as i8 as i64,
                            ElemType::I16 => bits as u16 as i16 as i64,
                            ElemType::I32 => bits as u32 as i32 as i64,
                            _ => bits as i64,
                        };
                        v.to_string()
                    }
                    None => "?".to_string(),
                }
            }
            ElemType::F32 => match self.array_u64(arena, i) {
                Some(bits) => f32::from_bits(bits as u32).to_string(),
                None => "?".to_string(),
            },
            ElemType::F64 => match self.array_u64(arena, i) {
                Some(bits) => f64::from_bits(bits).to_string(),
                None => "?".to_string(),
            },
            _ => self
                .array_u64(arena, i)
                .map_or_else(|| "?".to_string(), |v| v.to_string()),
        }
    }

    /// Array element `i` widened to u64, reading from `arena` in the byte
    /// order the payload was stored with (always little-endian: decoders
    /// normalize on emit).
    pub fn array_u64(&self, arena: &ByteArena, i: u32) -> Option<u64> {
        if self.kind != ValueKind::Array && self.kind != ValueKind::Bytes {
            return None;
        }
        let span = self.span()?;
        let bytes = arena.span(span);
        let off = u64::from(i) * u64::from(self.elem.size());
        match self.elem.size() {
            1 => crate::reader::read_u8(bytes, off).map(u64::from),
            2 => crate::reader::read_u16(bytes, off, ByteOrder::LittleEndian).map(u64::from),
            4 => crate::reader::read_u32(bytes, off, ByteOrder::LittleEndian).map(u64::from),
            8 => crate::reader::read_u64(bytes, off, ByteOrder::LittleEndian),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rational_to_f64() {
        assert_eq!(URational::new(1, 2).to_f64(), 0.5);
        assert_eq!(URational::new(1, 0).to_f64(), 0.0);
        assert_eq!(SRational::new(-1, 2).to_f64(), -0.5);
        assert_eq!(format!("{}", URational::new(72, 1)), "72/1");
    }

    #[test]
    fn scalar_round_trip() {
        assert_eq!(MetaValue::u32(7).as_u32(), Some(7));
        assert_eq!(MetaValue::i16(-3).as_i64(), Some(-3));
        assert_eq!(MetaValue::f32(1.5).as_f64(), Some(1.5));
        assert!(MetaValue::empty().as_u64().is_none());
    }

    #[test]
    fn array_reads_from_arena() {
        let mut arena = ByteArena::new();
        let span = arena.intern(&[0x01, 0x00, 0x02, 0x00]).unwrap();
        let v = MetaValue::array(ElemType::U16, 2, span);
        assert_eq!(v.array_u64(&arena, 0), Some(1));
        assert_eq!(v.array_u64(&arena, 1), Some(2));
        assert_eq!(v.array_u64(&arena, 2), None);
    }
}
