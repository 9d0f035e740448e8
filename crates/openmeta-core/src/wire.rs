//! On-wire TIFF value types.
//!
//! TIFF 6.0 defines types 1..12; BigTIFF adds 16..18. Type 13 (IFD pointer)
//! shows up in EXIF SubIFD entries. Decoders record the original wire type
//! on every entry so consumers can reconstruct provenance.

/// TIFF value type per TIFF 6.0 / BigTIFF.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u16)]
pub enum TiffType {
    /// Unsigned 8-bit integer (BYTE).
    Byte = 1,
    /// ASCII string, null-terminated.
    Ascii = 2,
    /// Unsigned 16-bit integer (SHORT).
    Short = 3,
    /// Unsigned 32-bit integer (LONG).
    Long = 4,
    /// Unsigned rational: two LONG values (numerator/denominator).
    Rational = 5,
    /// Signed 8-bit integer (SBYTE).
    SByte = 6,
    /// Undefined byte sequence.
    Undefined = 7,
    /// Signed 16-bit integer (SSHORT).
    SShort = 8,
    /// Signed 32-bit integer (SLONG).
    SLong = 9,
    /// Signed rational: two SLONG values.
    SRational = 10,
    /// 32-bit IEEE float.
    Float = 11,
    /// 64-bit IEEE double.
    Double = 12,
    /// IFD pointer (same layout as LONG).
    Ifd = 13,
    /// Unsigned 64-bit integer (BigTIFF LONG8).
    Long8 = 16,
    /// Signed 64-bit integer (BigTIFF SLONG8).
    SLong8 = 17,
    /// 64-bit IFD pointer (BigTIFF IFD8).
    Ifd8 = 18,
}

impl TiffType {
    /// Parse a wire type code; `None` for unknown codes (entry is skipped).
    pub fn from_u16(value: u16) -> Option<Self> {
        match value {
            1 => Some(TiffType::Byte),
            2 => Some(TiffType::Ascii),
            3 => Some(TiffType::Short),
            4 => Some(TiffType::Long),
            5 => Some(TiffType::Rational),
            6 => Some(TiffType::SByte),
            7 => Some(TiffType::Undefined),
            8 => Some(TiffType::SShort),
            9 => Some(TiffType::SLong),
            10 => Some(TiffType::SRational),
            11 => Some(TiffType::Float),
            12 => Some(TiffType::Double),
            13 => Some(TiffType::Ifd),
            16 => Some(TiffType::Long8),
            17 => Some(TiffType::SLong8),
            18 => Some(TiffType::Ifd8),
            _ => None,
        }
    }

    /// Size of one element in bytes.
    #[inline]
    pub const fn size(self) -> u64 {
        match self {
            TiffType::Byte | TiffType::Ascii | TiffType::SByte | TiffType::Undefined => 1,
            TiffType::Short | TiffType::SShort => 2,
            TiffType::Long | TiffType::SLong | TiffType::Float | TiffType::Ifd => 4,
            TiffType::Rational
            | TiffType::SRational
            | TiffType::Double
            | TiffType::Long8
            | TiffType::SLong8
            | TiffType::Ifd8 => 8,
        }
    }

    /// Human-readable name.
    pub const fn name(self) -> &'static str {
        match self {
            TiffType::Byte => "int8u",
            TiffType::Ascii => "string",
            TiffType::Short => "int16u",
            TiffType::Long => "int32u",
            TiffType::Rational => "rational64u",
            TiffType::SByte => "int8s",
            TiffType::Undefined => "undef",
            TiffType::SShort => "int16s",
            TiffType::SLong => "int32s",
            TiffType::SRational => "rational64s",
            TiffType::Float => "float",
            TiffType::Double => "double",
            TiffType::Ifd => "ifd",
            TiffType::Long8 => "int64u",
            TiffType::SLong8 => "int64s",
            TiffType::Ifd8 => "ifd64",
        }
    }

    /// Check if this type is an IFD pointer.
    #[inline]
    pub const fn is_ifd_pointer(self) -> bool {
        matches!(self, TiffType::Ifd | TiffType::Ifd8)
    }
}

impl std::fmt::Display for TiffType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name())
    }
}

/// Size of a wire type code, 0 when unknown.
///
/// Convenience for decoders that work with raw `u16` codes before deciding
/// whether the entry is decodable.
#[inline]
pub fn tiff_type_size(code: u16) -> u64 {
    TiffType::from_u16(code).map_or(0, TiffType::size)
}

/// Family the original wire type code belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WireFamily {
    /// Synthetic entry, no wire representation.
    None,
    /// TIFF 6.0 / BigTIFF type code.
    Tiff,
    /// Vendor-defined code (fixed-layout MakerNote tables).
    Vendor,
}

/// Original on-wire type, recorded per entry for provenance.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[must_use]
pub struct WireType {
    pub family: WireFamily,
    pub code: u16,
}

impl WireType {
    /// Synthetic entry with no wire representation.
    pub const NONE: WireType = WireType { family: WireFamily::None, code: 0 };

    /// TIFF wire type.
    pub const fn tiff(code: u16) -> Self {
        Self { family: WireFamily::Tiff, code }
    }

    /// Vendor fixed-layout type.
    pub const fn vendor(code: u16) -> Self {
        Self { family: WireFamily::Vendor, code }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn type_sizes() {
        assert_eq!(TiffType::Byte.size(), 1);
        assert_eq!(TiffType::Short.size(), 2);
        assert_eq!(TiffType::Long.size(), 4);
        assert_eq!(TiffType::Rational.size(), 8);
        assert_eq!(TiffType::Ifd8.size(), 8);
    }

    #[test]
    fn type_parsing() {
        assert_eq!(TiffType::from_u16(1), Some(TiffType::Byte));
        assert_eq!(TiffType::from_u16(5), Some(TiffType::Rational));
        assert_eq!(TiffType::from_u16(18), Some(TiffType::Ifd8));
        assert_eq!(TiffType::from_u16(0), None);
        assert_eq!(TiffType::from_u16(14), None);
        assert_eq!(TiffType::from_u16(99), None);
    }

    #[test]
    fn unknown_type_has_zero_size() {
        assert_eq!(tiff_type_size(0), 0);
        assert_eq!(tiff_type_size(3), 2);
    }
}
