#![no_main]

use libfuzzer_sys::fuzz_target;
use openmeta_formats::{BlockRef, PreviewCandidate, PreviewScanOptions};

fuzz_target!(|data: &[u8]| {
    // Fuzz preview discovery and extraction with arbitrary data.
    let mut blocks = [BlockRef::default(); 16];
    let mut out = [PreviewCandidate::default(); 16];
    let result = openmeta_formats::scan_preview_candidates(
        data,
        &mut blocks,
        &mut out,
        &PreviewScanOptions::default(),
    );
    let mut buf = [0u8; 4096];
    for candidate in &out[..result.written as usize] {
        let _ = openmeta_formats::extract_preview_candidate(
            data,
            candidate,
            &mut buf,
            &Default::default(),
        );
    }
});
