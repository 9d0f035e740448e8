#![no_main]

use libfuzzer_sys::fuzz_target;
use openmeta_core::MetaStore;
use openmeta_formats::ExifDecodeOptions;

fuzz_target!(|data: &[u8]| {
    // Fuzz the EXIF/TIFF walker (MakerNotes included) with arbitrary data.
    let mut store = MetaStore::new();
    let _ = openmeta_formats::decode_tiff_stream(data, &mut store, &ExifDecodeOptions::default());
});
