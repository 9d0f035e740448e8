#![no_main]

use libfuzzer_sys::fuzz_target;
use openmeta_core::MetaStore;
use openmeta_formats::{BlockRef, ExifDecodeOptions, IfdRef, PayloadOptions, PayloadPart};

fuzz_target!(|data: &[u8]| {
    // Fuzz the whole pipeline through the facade.
    let mut store = MetaStore::new();
    let mut blocks = [BlockRef::default(); 16];
    let mut ifd_refs = [IfdRef::default(); 8];
    let mut payload = [0u8; 4096];
    let mut parts = [PayloadPart::default(); 8];
    let _ = openmeta_formats::simple_meta_read(
        data,
        &mut store,
        &mut blocks,
        &mut ifd_refs,
        &mut payload,
        &mut parts,
        &ExifDecodeOptions::default(),
        &PayloadOptions::default(),
    );
});
