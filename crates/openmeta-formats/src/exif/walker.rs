//! The EXIF/TIFF IFD-chain walker.
//!
//! Walks the chained IFDs of a TIFF stream, recursing into the well-known
//! sub-IFD pointer tags, dispatching MakerNotes and deriving GeoTIFF keys.
//! Cycles are defeated with a visited set keyed by stream offset.

use openmeta_core::{BlockId, DecodeStatus, EntryFlags, MetaStore, TiffConfig, TiffType};
use tracing::debug;

use super::classic::{self, IfdValueRef, OffsetPolicy, RawIfdEntry};
use super::{geotiff, ExifDecodeOptions, ExifDecodeResult};
use crate::makernotes;

const TAG_EXIF_IFD: u16 = 0x8769;
const TAG_GPS_IFD: u16 = 0x8825;
const TAG_INTEROP_IFD: u16 = 0xA005;
const TAG_SUB_IFDS: u16 = 0x014A;
const TAG_MAKER_NOTE: u16 = 0x927C;
const TAG_GEO_KEY_DIRECTORY: u16 = 0x87AF;
const TAG_GEO_DOUBLE_PARAMS: u16 = 0x87B0;
const TAG_GEO_ASCII_PARAMS: u16 = 0x87B1;

/// Decode the IFD chain of a TIFF stream into `store`.
///
/// `bytes` is the TIFF stream (starting at its byte-order marker) and
/// `first_ifd` the stream-relative offset of IFD0. The store accumulates
/// across calls; the caller finalizes once all blocks are decoded.
pub fn decode_exif_tiff(
    bytes: &[u8],
    cfg: TiffConfig,
    first_ifd: u64,
    store: &mut MetaStore,
    options: &ExifDecodeOptions,
) -> ExifDecodeResult {
    let mut walker = Walker {
        bytes,
        cfg,
        store,
        options,
        result: ExifDecodeResult::default(),
        visited: Vec::new(),
    };
    walker.walk_chain(first_ifd);
    walker.result
}

struct Walker<'a, 'b> {
    bytes: &'a [u8],
    cfg: TiffConfig,
    store: &'b mut MetaStore,
    options: &'b ExifDecodeOptions,
    result: ExifDecodeResult,
    visited: Vec<u64>,
}

impl Walker<'_, '_> {
    /// Walk the `ifd0 -> ifd1 -> ...` chain from `first_ifd`.
    fn walk_chain(&mut self, first_ifd: u64) {
        let mut ifd_off = first_ifd;
        let mut index = 0u32;
        while ifd_off != 0 {
            let name = self.options.token(&format!("ifd{index}"));
            let Some(next) = self.walk_ifd(ifd_off, &name, BlockId::INVALID) else {
                break;
            };
            ifd_off = next;
            index += 1;
        }
    }

    /// True when `offset` was already visited (cycle), marking it otherwise.
    fn enter(&mut self, offset: u64) -> bool {
        if self.visited.contains(&offset) {
            debug!(offset, "ifd cycle detected");
            self.result.update(DecodeStatus::Malformed);
            return false;
        }
        self.visited.push(offset);
        true
    }

    /// Decode one IFD and recurse; returns the next-IFD offset for chains.
    fn walk_ifd(&mut self, ifd_off: u64, name: &str, parent: BlockId) -> Option<u64> {
        if !self.enter(ifd_off) {
            return None;
        }

        let mut interesting: Vec<(RawIfdEntry, IfdValueRef)> = Vec::new();
        let outcome = classic::decode_ifd_no_header(
            self.cfg,
            self.bytes,
            ifd_off,
            name,
            parent,
            OffsetPolicy::absolute(),
            EntryFlags::NONE,
            self.store,
            self.options,
            &mut self.result,
            |raw, vref| {
                if matches!(
                    raw.tag,
                    TAG_EXIF_IFD
                        | TAG_GPS_IFD
                        | TAG_INTEROP_IFD
                        | TAG_SUB_IFDS
                        | TAG_MAKER_NOTE
                        | TAG_GEO_KEY_DIRECTORY
                        | TAG_GEO_DOUBLE_PARAMS
                        | TAG_GEO_ASCII_PARAMS
                ) {
                    interesting.push((*raw, *vref));
                }
            },
        )?;

        let mut geo_dir: Option<(RawIfdEntry, IfdValueRef)> = None;
        let mut geo_doubles: Option<IfdValueRef> = None;
        let mut geo_ascii: Option<IfdValueRef> = None;

        for (raw, vref) in interesting {
            match raw.tag {
                TAG_EXIF_IFD => self.recurse_pointer(&raw, &vref, "exif", outcome.block),
                TAG_GPS_IFD => self.recurse_pointer(&raw, &vref, "gps", outcome.block),
                TAG_INTEROP_IFD => self.recurse_pointer(&raw, &vref, "interop", outcome.block),
                TAG_SUB_IFDS => self.recurse_sub_ifds(&raw, &vref, outcome.block),
                TAG_MAKER_NOTE => {
                    if self.options.decode_makernote && !vref.inline {
                        makernotes::decode_makernote(
                            self.cfg,
                            self.bytes,
                            vref.value_off,
                            vref.value_bytes,
                            self.store,
                            self.options,
                            &mut self.result,
                        );
                    }
                }
                TAG_GEO_KEY_DIRECTORY => geo_dir = Some((raw, vref)),
                TAG_GEO_DOUBLE_PARAMS => geo_doubles = Some(vref),
                TAG_GEO_ASCII_PARAMS => geo_ascii = Some(vref),
                _ => {}
            }
        }

        if self.options.decode_geotiff {
            if let Some((raw, vref)) = geo_dir {
                geotiff::decode_geo_keys(
                    self.cfg,
                    self.bytes,
                    &raw,
                    &vref,
                    geo_doubles,
                    geo_ascii,
                    self.store,
                    self.options,
                    &mut self.result,
                );
            }
        }

        Some(outcome.next_ifd)
    }

    /// Follow a single sub-IFD pointer entry (`exif`, `gps`, `interop`).
    fn recurse_pointer(&mut self, raw: &RawIfdEntry, vref: &IfdValueRef, base: &str, parent: BlockId) {
        if raw.count != 1 {
            return;
        }
        let Some(child_off) = self.read_pointer(raw, vref, 0) else {
            self.result.update(DecodeStatus::Malformed);
            return;
        };
        if child_off == 0 {
            return;
        }
        let name = self.options.token(base);
        self.walk_ifd(child_off, &name, parent);
    }

    /// Follow a SubIFDs array entry (`subifd0`, `subifd1`, ...).
    fn recurse_sub_ifds(&mut self, raw: &RawIfdEntry, vref: &IfdValueRef, parent: BlockId) {
        for i in 0..raw.count.min(32) {
            let Some(child_off) = self.read_pointer(raw, vref, i) else {
                self.result.update(DecodeStatus::Malformed);
                break;
            };
            if child_off == 0 {
                continue;
            }
            let name = self.options.token(&format!("subifd{i}"));
            self.walk_ifd(child_off, &name, parent);
        }
    }

    /// Read the `i`-th pointer of a LONG/IFD (or LONG8/IFD8) entry.
    fn read_pointer(&self, raw: &RawIfdEntry, vref: &IfdValueRef, i: u64) -> Option<u64> {
        let wide = matches!(
            TiffType::from_u16(raw.wire_type),
            Some(TiffType::Long8 | TiffType::Ifd8)
        );
        if wide {
            self.cfg.read_u64(self.bytes, vref.value_off + i * 8)
        } else {
            self.cfg
                .read_u32(self.bytes, vref.value_off + i * 4)
                .map(u64::from)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use openmeta_core::{ByteOrder, MetaStore};

    /// Minimal TIFF: IFD0 with an ExifIFD pointer, EXIF IFD with one tag.
    fn tiff_with_exif_ifd() -> Vec<u8> {
        let mut t = b"II\x2A\x00\x08\x00\x00\x00".to_vec();
        // IFD0 @8: 1 entry (ExifIFD pointer -> 26), next = 0
        t.extend_from_slice(&1u16.to_le_bytes());
        t.extend_from_slice(&0x8769u16.to_le_bytes());
        t.extend_from_slice(&4u16.to_le_bytes());
        t.extend_from_slice(&1u32.to_le_bytes());
        t.extend_from_slice(&26u32.to_le_bytes());
        t.extend_from_slice(&0u32.to_le_bytes());
        // EXIF IFD @26: 1 entry (ISO SHORT = 200), next = 0
        t.extend_from_slice(&1u16.to_le_bytes());
        t.extend_from_slice(&0x8827u16.to_le_bytes());
        t.extend_from_slice(&3u16.to_le_bytes());
        t.extend_from_slice(&1u32.to_le_bytes());
        t.extend_from_slice(&200u32.to_le_bytes());
        t.extend_from_slice(&0u32.to_le_bytes());
        t
    }

    #[test]
    fn recurses_into_exif_ifd() {
        let tiff = tiff_with_exif_ifd();
        let mut store = MetaStore::new();
        let options = ExifDecodeOptions::default();
        let result = decode_exif_tiff(
            &tiff,
            TiffConfig::classic(ByteOrder::LittleEndian),
            8,
            &mut store,
            &options,
        );
        assert_eq!(result.status, DecodeStatus::Ok);
        assert_eq!(result.ifds_walked, 2);
        assert_eq!(store.block_count(), 2);
        assert_eq!(store.block_token(store.entries()[1].origin.block), "exif");
        assert_eq!(store.entries()[1].value.as_u32(), Some(200));
    }

    #[test]
    fn self_referencing_chain_is_finite() {
        let mut t = b"II\x2A\x00\x08\x00\x00\x00".to_vec();
        t.extend_from_slice(&0u16.to_le_bytes());
        t.extend_from_slice(&8u32.to_le_bytes()); // next IFD -> itself
        let mut store = MetaStore::new();
        let options = ExifDecodeOptions::default();
        let result = decode_exif_tiff(
            &t,
            TiffConfig::classic(ByteOrder::LittleEndian),
            8,
            &mut store,
            &options,
        );
        assert_eq!(result.ifds_walked, 1);
        assert_eq!(result.status, DecodeStatus::Malformed);
    }

    #[test]
    fn ifd_limit_stops_recursion() {
        let tiff = tiff_with_exif_ifd();
        let mut store = MetaStore::new();
        let mut options = ExifDecodeOptions::default();
        options.limits.max_ifds = 1;
        let result = decode_exif_tiff(
            &tiff,
            TiffConfig::classic(ByteOrder::LittleEndian),
            8,
            &mut store,
            &options,
        );
        assert_eq!(result.status, DecodeStatus::LimitExceeded);
        assert_eq!(result.ifds_walked, 1);
        // IFD0's entry survives.
        assert_eq!(store.entry_count(), 1);
    }

    #[test]
    fn namespaced_tokens() {
        let tiff = tiff_with_exif_ifd();
        let mut store = MetaStore::new();
        let options = ExifDecodeOptions {
            token_namespace: "b1_".to_string(),
            ..ExifDecodeOptions::default()
        };
        decode_exif_tiff(
            &tiff,
            TiffConfig::classic(ByteOrder::LittleEndian),
            8,
            &mut store,
            &options,
        );
        assert_eq!(store.block_token(store.entries()[0].origin.block), "b1_ifd0");
        assert_eq!(store.block_token(store.entries()[1].origin.block), "b1_exif");
    }
}
