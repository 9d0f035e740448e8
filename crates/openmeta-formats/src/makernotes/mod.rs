//! Vendor MakerNote dispatch and decoders.
//!
//! EXIF tag 0x927C carries a vendor-defined binary blob. Each vendor module
//! implements the same capability pair - `detect(make, model, header)` and
//! `decode(...)` - and the dispatcher tries them in registration order.
//! Adding a vendor is one line in [`VENDORS`].
//!
//! The dispatcher never fails: if no decoder claims the blob (or the chosen
//! one declines), the raw MakerNote entry emitted by the EXIF walker stays
//! in the store untouched.

mod canon;
mod casio;
mod flir;
mod hp;
mod kodak;
mod minolta;
mod nikon;
mod nintendo;
mod olympus;
mod panasonic;
mod pentax;
mod reconyx;
mod ricoh;
mod samsung;
mod sony;
pub(crate) mod util;

use openmeta_core::{reader, MetaStore, TiffConfig};
use tracing::debug;

use crate::exif::{ExifContext, ExifDecodeOptions, ExifDecodeResult};

const TAG_MAKE: u16 = 0x010F;
const TAG_MODEL: u16 = 0x0110;

/// Everything a vendor decoder gets to look at.
pub(crate) struct NoteContext<'a> {
    /// Outer TIFF stream configuration.
    pub cfg: TiffConfig,
    /// The whole TIFF stream (MakerNote offsets are often absolute in it).
    pub tiff: &'a [u8],
    /// Stream-relative offset of the MakerNote value.
    pub note_off: u64,
    /// MakerNote value length in bytes.
    pub note_len: u64,
    /// IFD0 Make, empty when absent.
    pub make: String,
    /// IFD0 Model, empty when absent.
    pub model: String,
}

impl NoteContext<'_> {
    /// The MakerNote window itself.
    pub fn note(&self) -> &[u8] {
        reader::window(self.tiff, self.note_off, self.note_len).unwrap_or(&[])
    }

    /// Case-insensitive Make substring test (`needle` in upper case).
    pub fn make_has(&self, needle: &str) -> bool {
        self.make.to_ascii_uppercase().contains(needle)
    }

    /// Case-insensitive Model substring test (`needle` in upper case).
    pub fn model_has(&self, needle: &str) -> bool {
        self.model.to_ascii_uppercase().contains(needle)
    }

    /// Magic prefix test on the note bytes.
    pub fn note_starts(&self, magic: &[u8]) -> bool {
        reader::match_bytes(self.note(), 0, magic)
    }
}

/// Token pair for one vendor's blocks: `mk_<vendor>` prefix for subtables,
/// `mk_<vendor>_0` for the main note IFD.
pub(crate) struct MkTokens {
    pub prefix: String,
    pub ifd0: String,
}

impl MkTokens {
    fn new(options: &ExifDecodeOptions, vendor: &str) -> Self {
        let prefix = options.token(&format!("mk_{vendor}"));
        let ifd0 = format!("{prefix}_0");
        Self { prefix, ifd0 }
    }

    /// Deterministic subtable token (`mk_canon_camerasettings_0`).
    pub fn subtable(&self, name: &str, index: u32) -> String {
        crate::exif::classic::make_mk_subtable_ifd_token(&self.prefix, name, index)
    }
}

type DetectFn = fn(&NoteContext<'_>) -> bool;
type DecodeFn =
    fn(&NoteContext<'_>, &MkTokens, &mut MetaStore, &ExifDecodeOptions, &mut ExifDecodeResult) -> bool;

struct VendorDecoder {
    name: &'static str,
    detect: DetectFn,
    decode: DecodeFn,
}

/// Registration order is detection order: header-magic vendors first, then
/// the Make-string fallbacks.
static VENDORS: &[VendorDecoder] = &[
    VendorDecoder { name: "olympus", detect: olympus::detect, decode: olympus::decode },
    VendorDecoder { name: "nikon", detect: nikon::detect, decode: nikon::decode },
    VendorDecoder { name: "sony", detect: sony::detect, decode: sony::decode },
    VendorDecoder { name: "pentax", detect: pentax::detect, decode: pentax::decode },
    VendorDecoder { name: "casio", detect: casio::detect, decode: casio::decode },
    VendorDecoder { name: "flir", detect: flir::detect, decode: flir::decode },
    VendorDecoder { name: "hp", detect: hp::detect, decode: hp::decode },
    VendorDecoder { name: "reconyx", detect: reconyx::detect, decode: reconyx::decode },
    VendorDecoder { name: "samsung", detect: samsung::detect, decode: samsung::decode },
    VendorDecoder { name: "ricoh", detect: ricoh::detect, decode: ricoh::decode },
    VendorDecoder { name: "panasonic", detect: panasonic::detect, decode: panasonic::decode },
    VendorDecoder { name: "canon", detect: canon::detect, decode: canon::decode },
    VendorDecoder { name: "minolta", detect: minolta::detect, decode: minolta::decode },
    VendorDecoder { name: "kodak", detect: kodak::detect, decode: kodak::decode },
    VendorDecoder { name: "nintendo", detect: nintendo::detect, decode: nintendo::decode },
];

/// Pick a vendor decoder for the MakerNote at `note_off` and run it.
pub(crate) fn decode_makernote(
    cfg: TiffConfig,
    tiff: &[u8],
    note_off: u64,
    note_len: u64,
    store: &mut MetaStore,
    options: &ExifDecodeOptions,
    result: &mut ExifDecodeResult,
) {
    if reader::window(tiff, note_off, note_len).is_none() || note_len == 0 {
        return;
    }

    let ifd0 = options.token("ifd0");
    let mut lookup = ExifContext::new();
    let make = lookup.find_first_text(store, &ifd0, TAG_MAKE).unwrap_or_default();
    let model = lookup.find_first_text(store, &ifd0, TAG_MODEL).unwrap_or_default();

    let ctx = NoteContext { cfg, tiff, note_off, note_len, make, model };
    for vendor in VENDORS {
        if !(vendor.detect)(&ctx) {
            continue;
        }
        debug!(vendor = vendor.name, note_len, "decoding makernote");
        let mk = MkTokens::new(options, vendor.name);
        if (vendor.decode)(&ctx, &mk, store, options, result) {
            return;
        }
        // Decoder declined despite detection; the raw entry stays as-is.
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mk_tokens_are_deterministic() {
        let options = ExifDecodeOptions::default();
        let mk = MkTokens::new(&options, "canon");
        assert_eq!(mk.ifd0, "mk_canon_0");
        assert_eq!(mk.subtable("camerasettings", 0), "mk_canon_camerasettings_0");
    }

    #[test]
    fn namespaced_mk_tokens() {
        let options = ExifDecodeOptions {
            token_namespace: "b2_".to_string(),
            ..ExifDecodeOptions::default()
        };
        let mk = MkTokens::new(&options, "sony");
        assert_eq!(mk.ifd0, "b2_mk_sony_0");
    }
}
