#![no_main]

use libfuzzer_sys::fuzz_target;
use openmeta_formats::BlockRef;

fuzz_target!(|data: &[u8]| {
    // Fuzz the container scanner with arbitrary data.
    let mut out = [BlockRef::default(); 16];
    let _ = openmeta_formats::scan_auto(data, &mut out);
});
