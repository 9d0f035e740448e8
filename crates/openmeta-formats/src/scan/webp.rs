//! WebP (RIFF) chunk scanner.
//!
//! File structure:
//! ```text
//! RIFF <size> WEBP
//!   VP8X <size> <flags> <canvas>     ; extended header (optional)
//!   ICCP <size> <profile>            ; ICC profile (optional)
//!   EXIF <size> <exif-data>          ; EXIF metadata (optional)
//!   XMP  <size> <xmp-data>           ; XMP metadata (optional)
//! ```
//!
//! Chunk sizes are little-endian and payloads pad to even length.

use openmeta_core::{reader, ByteOrder, DecodeStatus};

use crate::block::{BlockKind, BlockRef, BlockSink, ContainerFormat, ScanResult};

/// Scan a WebP file for metadata chunks.
pub fn scan_webp(bytes: &[u8], out: &mut [BlockRef]) -> ScanResult {
    let mut sink = BlockSink::new(out);
    let mut status = DecodeStatus::Ok;

    if !reader::match_bytes(bytes, 0, b"RIFF") || !reader::match_bytes(bytes, 8, b"WEBP") {
        status.merge(DecodeStatus::Unsupported);
        return sink.finish(status);
    }
    let riff_size = reader::read_u32(bytes, 4, ByteOrder::LittleEndian).unwrap_or(0);
    let riff_end = 8u64.saturating_add(u64::from(riff_size)).min(bytes.len() as u64);

    let mut pos: u64 = 12;
    while pos + 8 <= riff_end {
        let Some(size) = reader::read_u32(bytes, pos + 4, ByteOrder::LittleEndian) else {
            break;
        };
        let data_off = pos + 8;
        let data_len = u64::from(size);
        if data_off + data_len > riff_end {
            status.merge(DecodeStatus::Malformed);
            break;
        }

        let fourcc = reader::read_u32(bytes, pos, ByteOrder::BigEndian).unwrap_or(0);
        let kind = match &bytes[pos as usize..(pos + 4) as usize] {
            b"EXIF" => Some(BlockKind::Exif),
            b"XMP " => Some(BlockKind::Xmp),
            b"ICCP" => Some(BlockKind::Icc),
            _ => None,
        };
        if let Some(kind) = kind {
            sink.push(BlockRef {
                format: ContainerFormat::Webp,
                kind,
                data_offset: data_off,
                data_size: data_len,
                id: fourcc,
                ..BlockRef::default()
            });
        }

        // Word-aligned: odd-sized payloads are followed by one pad byte.
        pos = data_off + data_len + (data_len & 1);
    }

    sink.finish(status)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn webp(chunks: &[(&[u8; 4], &[u8])]) -> Vec<u8> {
        let mut body = b"WEBP".to_vec();
        for (fourcc, data) in chunks {
            body.extend_from_slice(*fourcc);
            body.extend_from_slice(&(data.len() as u32).to_le_bytes());
            body.extend_from_slice(data);
            if data.len() % 2 == 1 {
                body.push(0);
            }
        }
        let mut file = b"RIFF".to_vec();
        file.extend_from_slice(&(body.len() as u32).to_le_bytes());
        file.extend_from_slice(&body);
        file
    }

    #[test]
    fn metadata_chunks_in_order() {
        let file = webp(&[
            (b"EXIF", b"II\x2A\x00\x08\x00\x00\x00"),
            (b"XMP ", b"<xmp/>"),
            (b"ICCP", b"prof!"),
        ]);
        let mut out = [BlockRef::default(); 4];
        let result = scan_webp(&file, &mut out);
        assert_eq!(result.status, DecodeStatus::Ok);
        assert_eq!(result.written, 3);
        assert_eq!(out[0].kind, BlockKind::Exif);
        assert_eq!(out[1].kind, BlockKind::Xmp);
        assert_eq!(out[2].kind, BlockKind::Icc);
        // Payload starts right after the 8-byte chunk header.
        assert_eq!(out[0].data_offset, 12 + 8);
        // Odd ICCP payload was padded, not shortened.
        assert_eq!(out[2].data_size, 5);
    }

    #[test]
    fn oversized_chunk_is_malformed() {
        let mut file = webp(&[]);
        file.extend_from_slice(b"EXIF");
        file.extend_from_slice(&100u32.to_le_bytes());
        file.extend_from_slice(b"xx");
        // Fix up the RIFF size to cover the bogus chunk.
        let total = file.len() as u32 - 8;
        file[4..8].copy_from_slice(&total.to_le_bytes());
        let mut out = [BlockRef::default(); 2];
        let result = scan_webp(&file, &mut out);
        assert_eq!(result.status, DecodeStatus::Malformed);
    }
}
