//! End-to-end facade tests: scan, decode, payload collection, finalize.

use openmeta_core::{DecodeStatus, EntryFlags, MetaKey, MetaStore};
use openmeta_formats::{
    simple_meta_read, BlockRef, ExifDecodeOptions, IfdRef, PayloadOptions, PayloadPart,
};

/// JPEG with an EXIF APP1 carrying a Canon MakerNote and GPS sub-IFD.
fn jpeg_fixture() -> Vec<u8> {
    // TIFF stream: IFD0 (Make, Model, ExifIFD ptr), EXIF IFD (MakerNote),
    // MakerNote (Canon IFD with one inline SHORT).
    let mut tiff = b"II\x2A\x00\x08\x00\x00\x00".to_vec();
    // IFD0 @8: 3 entries, next = 0. Entries end 8+2+36 = 46, next -> 50.
    tiff.extend_from_slice(&3u16.to_le_bytes());
    // Make ASCII[6] -> 50
    tiff.extend_from_slice(&0x010Fu16.to_le_bytes());
    tiff.extend_from_slice(&2u16.to_le_bytes());
    tiff.extend_from_slice(&6u32.to_le_bytes());
    tiff.extend_from_slice(&50u32.to_le_bytes());
    // Model ASCII[4] inline "5D\0\0"
    tiff.extend_from_slice(&0x0110u16.to_le_bytes());
    tiff.extend_from_slice(&2u16.to_le_bytes());
    tiff.extend_from_slice(&4u32.to_le_bytes());
    tiff.extend_from_slice(b"5D\0\0");
    // ExifIFD pointer -> 56
    tiff.extend_from_slice(&0x8769u16.to_le_bytes());
    tiff.extend_from_slice(&4u16.to_le_bytes());
    tiff.extend_from_slice(&1u32.to_le_bytes());
    tiff.extend_from_slice(&56u32.to_le_bytes());
    tiff.extend_from_slice(&0u32.to_le_bytes()); // next IFD
    assert_eq!(tiff.len(), 50);
    tiff.extend_from_slice(b"Canon\0");
    // EXIF IFD @56: 1 entry (MakerNote UNDEFINED[18] -> 74), next = 0.
    tiff.extend_from_slice(&1u16.to_le_bytes());
    tiff.extend_from_slice(&0x927Cu16.to_le_bytes());
    tiff.extend_from_slice(&7u16.to_le_bytes());
    tiff.extend_from_slice(&18u32.to_le_bytes());
    tiff.extend_from_slice(&74u32.to_le_bytes());
    tiff.extend_from_slice(&0u32.to_le_bytes());
    assert_eq!(tiff.len(), 74);
    // Canon MakerNote @74: one inline SHORT entry (ModelID-ish).
    tiff.extend_from_slice(&1u16.to_le_bytes());
    tiff.extend_from_slice(&0x0010u16.to_le_bytes());
    tiff.extend_from_slice(&3u16.to_le_bytes());
    tiff.extend_from_slice(&1u32.to_le_bytes());
    tiff.extend_from_slice(&0x0213u32.to_le_bytes());
    tiff.extend_from_slice(&0u32.to_le_bytes());

    let mut payload = b"Exif\x00\x00".to_vec();
    payload.extend_from_slice(&tiff);
    let mut file = vec![0xFF, 0xD8, 0xFF, 0xE1];
    file.extend_from_slice(&((payload.len() + 2) as u16).to_be_bytes());
    file.extend_from_slice(&payload);
    file.extend_from_slice(&[0xFF, 0xD9]);
    file
}

#[test]
fn decodes_nested_structures_through_the_facade() {
    let file = jpeg_fixture();
    let mut store = MetaStore::new();
    let mut blocks = [BlockRef::default(); 8];
    let mut ifd_refs = [IfdRef::default(); 4];
    let mut payload = vec![0u8; 64];
    let mut parts = [PayloadPart::default(); 4];

    let result = simple_meta_read(
        &file,
        &mut store,
        &mut blocks,
        &mut ifd_refs,
        &mut payload,
        &mut parts,
        &ExifDecodeOptions::default(),
        &PayloadOptions::default(),
    );
    assert_eq!(result.status, DecodeStatus::Ok);
    assert_eq!(result.ifd_refs_written, 1);

    let token_of = |e: &openmeta_core::Entry| store.block_token(e.origin.block).to_string();
    let tokens: Vec<String> = store.iter().map(|(_, e)| token_of(e)).collect();
    assert!(tokens.iter().any(|t| t == "ifd0"));
    assert!(tokens.iter().any(|t| t == "exif"));
    assert!(tokens.iter().any(|t| t == "mk_canon_0"));

    // The MakerNote inline SHORT survived dispatch.
    let model_id = store
        .iter()
        .find(|(_, e)| {
            store.block_token(e.origin.block) == "mk_canon_0"
                && e.key.exif_tag() == Some(0x0010)
        })
        .map(|(_, e)| *e)
        .unwrap();
    assert_eq!(model_id.value.as_u32(), Some(0x0213));
}

#[test]
fn facade_is_deterministic() {
    let file = jpeg_fixture();

    let run = || {
        let mut store = MetaStore::new();
        let mut blocks = [BlockRef::default(); 8];
        let mut ifd_refs = [IfdRef::default(); 4];
        let mut payload = vec![0u8; 64];
        let mut parts = [PayloadPart::default(); 4];
        simple_meta_read(
            &file,
            &mut store,
            &mut blocks,
            &mut ifd_refs,
            &mut payload,
            &mut parts,
            &ExifDecodeOptions::default(),
            &PayloadOptions::default(),
        );
        store
    };

    let a = run();
    let b = run();
    assert_eq!(a.entry_count(), b.entry_count());
    for (ea, eb) in a.entries().iter().zip(b.entries()) {
        assert_eq!(ea.key.exif_tag(), eb.key.exif_tag());
        assert_eq!(a.block_token(ea.origin.block), b.block_token(eb.origin.block));
        let va = ea.value.span().map(|s| a.arena().span(s).to_vec());
        let vb = eb.value.span().map(|s| b.arena().span(s).to_vec());
        assert_eq!(va, vb);
    }
}

/// Pre-growing the arena must not change what derived-table decoders emit
/// (decoders copy source bytes before appending).
#[test]
fn arena_growth_does_not_change_derived_entries() {
    let file = jpeg_fixture();
    let mut blocks = [BlockRef::default(); 8];
    openmeta_formats::scan_auto(&file, &mut blocks);
    let exif = blocks.iter().find(|b| b.data_size > 0).unwrap();
    let tiff = &file[exif.data_offset as usize..][..exif.data_size as usize];

    let run = |pregrow: bool| {
        let mut store = MetaStore::new();
        if pregrow {
            // Force several reallocation boundaries before decoding.
            for chunk in 0..8 {
                let filler = vec![chunk as u8; 1 << (6 + chunk)];
                store.arena_mut().intern(&filler).unwrap();
            }
        }
        openmeta_formats::decode_tiff_stream(tiff, &mut store, &ExifDecodeOptions::default());
        store
    };

    let plain = run(false);
    let grown = run(true);
    assert_eq!(plain.entry_count(), grown.entry_count());
    for (ea, eb) in plain.entries().iter().zip(grown.entries()) {
        assert_eq!(ea.key.exif_tag(), eb.key.exif_tag());
        let va = ea.value.span().map(|s| plain.arena().span(s).to_vec());
        let vb = eb.value.span().map(|s| grown.arena().span(s).to_vec());
        assert_eq!(va, vb);
        assert_eq!(ea.value.as_u64(), eb.value.as_u64());
    }
}

#[test]
fn finalize_skips_duplicate_entries() {
    // Two identical EXIF blocks would collide without namespacing; the
    // facade namespaces them, so both survive and iteration sees them all.
    let file = jpeg_fixture();
    let mut store = MetaStore::new();
    let mut blocks = [BlockRef::default(); 8];
    let mut ifd_refs = [IfdRef::default(); 4];
    let mut payload = vec![0u8; 64];
    let mut parts = [PayloadPart::default(); 4];
    simple_meta_read(
        &file,
        &mut store,
        &mut blocks,
        &mut ifd_refs,
        &mut payload,
        &mut parts,
        &ExifDecodeOptions::default(),
        &PayloadOptions::default(),
    );

    // No entry is deleted by finalize in the nominal single-block case.
    assert!(store
        .entries()
        .iter()
        .all(|e| !e.flags.contains(EntryFlags::DELETED)));
    // Every decoded key is an EXIF tag.
    assert!(store
        .iter()
        .all(|(_, e)| matches!(e.key, MetaKey::ExifTag { .. })));
}
