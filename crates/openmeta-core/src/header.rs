//! TIFF header parsing.
//!
//! Header structure (classic, 8 bytes): byte order marker "II"/"MM", magic
//! 42, u32 first-IFD offset. BigTIFF (16 bytes): magic 43, u16 offset size
//! (must be 8), u16 reserved, u64 first-IFD offset.

use crate::{reader, ByteOrder, Error, Result, TiffConfig};

/// Parsed TIFF stream header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[must_use]
pub struct TiffHeader {
    pub cfg: TiffConfig,
    pub first_ifd: u64,
}

/// Parse a classic or BigTIFF header at the start of `bytes`.
pub fn parse_tiff_header(bytes: &[u8]) -> Result<TiffHeader> {
    if bytes.len() < 8 {
        return Err(Error::UnexpectedEof { need: 8, have: bytes.len() });
    }
    let byte_order = ByteOrder::from_marker([bytes[0], bytes[1]])?;
    let magic = reader::read_u16(bytes, 2, byte_order)
        .ok_or(Error::UnexpectedEof { need: 4, have: bytes.len() })?;

    match magic {
        42 => {
            let first_ifd = reader::read_u32(bytes, 4, byte_order)
                .ok_or(Error::UnexpectedEof { need: 8, have: bytes.len() })?;
            Ok(TiffHeader {
                cfg: TiffConfig::classic(byte_order),
                first_ifd: u64::from(first_ifd),
            })
        }
        43 => {
            if bytes.len() < 16 {
                return Err(Error::UnexpectedEof { need: 16, have: bytes.len() });
            }
            let offset_size = reader::read_u16(bytes, 4, byte_order).unwrap_or(0);
            if offset_size != 8 {
                return Err(Error::InvalidTiffMagic(offset_size));
            }
            let first_ifd = reader::read_u64(bytes, 8, byte_order)
                .ok_or(Error::UnexpectedEof { need: 16, have: bytes.len() })?;
            Ok(TiffHeader { cfg: TiffConfig::bigtiff(byte_order), first_ifd })
        }
        other => Err(Error::InvalidTiffMagic(other)),
    }
}
