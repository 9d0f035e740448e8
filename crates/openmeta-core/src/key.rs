//! Entry keys.
//!
//! Keys are tagged unions over the naming schemes the decoders emit. The
//! string parts (IFD token, XMP namespace/name) are arena spans so a key is
//! `Copy` and the store stays flat.

use crate::{ByteArena, ByteSpan};

/// Key identifying a metadata entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[must_use]
pub enum MetaKey {
    /// EXIF/TIFF tag within a named IFD (`ifd0`, `exif`, `gps`,
    /// `mk_canon_camerasettings_0`, ...).
    ExifTag { ifd: ByteSpan, tag: u16 },
    /// XMP property; the core never emits these itself, but an external XMP
    /// decoder writing into the same store does.
    XmpProperty { ns: ByteSpan, name: ByteSpan },
    /// GeoTIFF key id derived from GeoKeyDirectory.
    GeoTiffKey(u16),
}

impl MetaKey {
    /// EXIF tag id, if this is an EXIF key.
    pub fn exif_tag(&self) -> Option<u16> {
        match self {
            MetaKey::ExifTag { tag, .. } => Some(*tag),
            _ => None,
        }
    }

    /// Structural equality with arena-resolved strings.
    ///
    /// Span handles from different interning calls may differ even when the
    /// token text is identical, so key comparison goes through the arena.
    pub fn same_key(&self, other: &MetaKey, arena: &ByteArena) -> bool {
        match (self, other) {
            (MetaKey::ExifTag { ifd: a, tag: ta }, MetaKey::ExifTag { ifd: b, tag: tb }) => {
                ta == tb && arena.span(*a) == arena.span(*b)
            }
            (
                MetaKey::XmpProperty { ns: na, name: pa },
                MetaKey::XmpProperty { ns: nb, name: pb },
            ) => arena.span(*na) == arena.span(*nb) && arena.span(*pa) == arena.span(*pb),
            (MetaKey::GeoTiffKey(a), MetaKey::GeoTiffKey(b)) => a == b,
            _ => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn same_key_resolves_tokens() {
        let mut arena = ByteArena::new();
        let a = arena.intern(b"exif").unwrap();
        let b = arena.intern(b"exif").unwrap();
        let c = arena.intern(b"gps").unwrap();

        let ka = MetaKey::ExifTag { ifd: a, tag: 0x0112 };
        let kb = MetaKey::ExifTag { ifd: b, tag: 0x0112 };
        let kc = MetaKey::ExifTag { ifd: c, tag: 0x0112 };

        assert!(ka.same_key(&kb, &arena));
        assert!(!ka.same_key(&kc, &arena));
        assert!(!ka.same_key(&MetaKey::GeoTiffKey(1), &arena));
    }
}
