//! Metadata block references.
//!
//! The container scanners emit one [`BlockRef`] per metadata-bearing region
//! of the input file. A block reference is a window into the caller's byte
//! span - the scanners never copy payloads.

use openmeta_core::DecodeStatus;

/// Container file format, as detected by magic.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ContainerFormat {
    #[default]
    Unknown,
    Jpeg,
    Png,
    Webp,
    Gif,
    Jp2,
    Jxl,
    Heif,
    Avif,
    Cr3,
    Tiff,
}

impl ContainerFormat {
    /// Short lowercase name for logs and tools.
    pub const fn name(self) -> &'static str {
        match self {
            ContainerFormat::Unknown => "unknown",
            ContainerFormat::Jpeg => "jpeg",
            ContainerFormat::Png => "png",
            ContainerFormat::Webp => "webp",
            ContainerFormat::Gif => "gif",
            ContainerFormat::Jp2 => "jp2",
            ContainerFormat::Jxl => "jxl",
            ContainerFormat::Heif => "heif",
            ContainerFormat::Avif => "avif",
            ContainerFormat::Cr3 => "cr3",
            ContainerFormat::Tiff => "tiff",
        }
    }
}

/// What the block contains.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum BlockKind {
    /// EXIF/TIFF stream.
    #[default]
    Exif,
    /// XMP packet (exposed, never parsed here).
    Xmp,
    /// ICC colour profile.
    Icc,
    /// Photoshop image-resource block (8BIM records).
    PhotoshopIrb,
    /// Compressed wrapper whose inner payload is metadata (JXL `brob`).
    CompressedMetadata,
}

impl BlockKind {
    /// Short lowercase name for logs and tools.
    pub const fn name(self) -> &'static str {
        match self {
            BlockKind::Exif => "exif",
            BlockKind::Xmp => "xmp",
            BlockKind::Icc => "icc",
            BlockKind::PhotoshopIrb => "psirb",
            BlockKind::CompressedMetadata => "compressed",
        }
    }
}

/// How a multi-part or prefixed payload is chunked on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum BlockChunking {
    /// Contiguous payload.
    #[default]
    None,
    /// JPEG APP2 ICC_PROFILE: 1-based `(seq, total)` bytes precede each part.
    JpegApp2SeqTotal,
    /// Photoshop APP13: sequence of 8BIM resource records.
    PsIrb8Bim,
    /// GIF application extension: payload split into length-prefixed
    /// sub-blocks that must be rejoined.
    GifSubBlocks,
    /// BMFF `Exif` item: payload starts with a u32 big-endian offset to the
    /// TIFF header (`aux_u32` carries it).
    BmffExifTiffOffsetU32Be,
}

/// Compression applied to the payload bytes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum BlockCompression {
    #[default]
    None,
    Deflate,
    Brotli,
}

/// One metadata-bearing region of the input file.
#[derive(Debug, Clone, Copy, Default)]
#[must_use]
pub struct BlockRef {
    pub format: ContainerFormat,
    pub kind: BlockKind,
    /// File-relative window of payload bytes.
    pub data_offset: u64,
    pub data_size: u64,
    pub chunking: BlockChunking,
    pub compression: BlockCompression,
    /// Format-specific tag / fourcc / marker that identified the block.
    pub id: u32,
    /// Per-chunking auxiliary value (TIFF-offset prefix, brob inner fourcc).
    pub aux_u32: u32,
    /// Part number for multi-part blocks, 0-based in emission order.
    pub part_index: u32,
    /// Declared part count, 0 when unknown.
    pub part_count: u32,
}

/// Result of a scan call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[must_use]
pub struct ScanResult {
    pub status: DecodeStatus,
    /// Blocks written to the output slice.
    pub written: u32,
    /// Blocks the input contains; grow the output to this and retry on
    /// [`DecodeStatus::OutputTruncated`].
    pub needed: u32,
}

/// Output cursor over the caller's `&mut [BlockRef]`.
///
/// Counts every block in `needed` even after the slice fills up, so callers
/// can size a retry buffer from one pass.
pub(crate) struct BlockSink<'a> {
    out: &'a mut [BlockRef],
    written: u32,
    needed: u32,
}

impl<'a> BlockSink<'a> {
    pub(crate) fn new(out: &'a mut [BlockRef]) -> Self {
        Self { out, written: 0, needed: 0 }
    }

    /// Emit one block. Zero-length blocks are dropped silently.
    pub(crate) fn push(&mut self, block: BlockRef) {
        if block.data_size == 0 {
            return;
        }
        if let Some(slot) = self.out.get_mut(self.needed as usize) {
            *slot = block;
            self.written += 1;
        }
        self.needed += 1;
    }

    pub(crate) fn finish(self, status: DecodeStatus) -> ScanResult {
        let mut status = status;
        if self.needed > self.written {
            status.merge(DecodeStatus::OutputTruncated);
        }
        ScanResult { status, written: self.written, needed: self.needed }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sink_counts_past_capacity() {
        let mut out = [BlockRef::default(); 1];
        let mut sink = BlockSink::new(&mut out);
        for _ in 0..3 {
            sink.push(BlockRef { data_size: 4, ..BlockRef::default() });
        }
        let result = sink.finish(DecodeStatus::Ok);
        assert_eq!(result.written, 1);
        assert_eq!(result.needed, 3);
        assert_eq!(result.status, DecodeStatus::OutputTruncated);
    }

    #[test]
    fn sink_drops_empty_blocks() {
        let mut out = [BlockRef::default(); 4];
        let mut sink = BlockSink::new(&mut out);
        sink.push(BlockRef::default());
        let result = sink.finish(DecodeStatus::Ok);
        assert_eq!(result.needed, 0);
        assert_eq!(result.status, DecodeStatus::Ok);
    }
}
