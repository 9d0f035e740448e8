//! End-to-end container scanning scenarios.
//!
//! Each test builds a minimal synthetic file and checks the exact block
//! list the scanner reports: kinds, order, payload windows, chunking and
//! compression markers.

use openmeta_core::DecodeStatus;
use openmeta_formats::{
    scan_auto, BlockChunking, BlockCompression, BlockKind, BlockRef, ContainerFormat,
};

fn blocks_of(file: &[u8]) -> (Vec<BlockRef>, DecodeStatus) {
    let mut out = vec![BlockRef::default(); 16];
    let result = scan_auto(file, &mut out);
    assert_eq!(result.written, result.needed, "scratch buffer too small");
    out.truncate(result.written as usize);
    (out, result.status)
}

fn jpeg_segment(marker: u8, payload: &[u8]) -> Vec<u8> {
    let mut seg = vec![0xFF, marker];
    seg.extend_from_slice(&((payload.len() + 2) as u16).to_be_bytes());
    seg.extend_from_slice(payload);
    seg
}

#[test]
fn jpeg_with_four_app_segments() {
    let mut file = vec![0xFF, 0xD8];
    let mut exif = b"Exif\x00\x00".to_vec();
    exif.extend_from_slice(b"II\x2A\x00\x00\x00\x00\x00");
    file.extend_from_slice(&jpeg_segment(0xE1, &exif));
    let exif_payload_off = 2 + 4 + 6;

    let mut xmp = b"http://ns.adobe.com/xap/1.0/\x00".to_vec();
    xmp.extend_from_slice(b"<xmp/>");
    let xmp_seg_off = file.len();
    file.extend_from_slice(&jpeg_segment(0xE1, &xmp));

    let mut icc = b"ICC_PROFILE\x00".to_vec();
    icc.push(1);
    icc.push(1);
    icc.extend_from_slice(b"ICC");
    let icc_seg_off = file.len();
    file.extend_from_slice(&jpeg_segment(0xE2, &icc));

    let mut psirb = b"Photoshop 3.0\x00".to_vec();
    psirb.extend_from_slice(b"DATA");
    let ps_seg_off = file.len();
    file.extend_from_slice(&jpeg_segment(0xED, &psirb));

    file.extend_from_slice(&[0xFF, 0xD9]);

    let (blocks, status) = blocks_of(&file);
    assert_eq!(status, DecodeStatus::Ok);
    assert_eq!(blocks.len(), 4);

    assert_eq!(blocks[0].kind, BlockKind::Exif);
    assert_eq!(blocks[0].data_offset, exif_payload_off as u64);
    assert_eq!(blocks[0].data_size, 8);

    assert_eq!(blocks[1].kind, BlockKind::Xmp);
    assert_eq!(blocks[1].data_offset, (xmp_seg_off + 4 + 29) as u64);
    assert_eq!(blocks[1].data_size, 6);

    assert_eq!(blocks[2].kind, BlockKind::Icc);
    assert_eq!(blocks[2].chunking, BlockChunking::JpegApp2SeqTotal);
    assert_eq!(blocks[2].data_offset, (icc_seg_off + 4 + 14) as u64);
    assert_eq!(blocks[2].data_size, 3);
    assert_eq!(blocks[2].part_count, 1);

    assert_eq!(blocks[3].kind, BlockKind::PhotoshopIrb);
    assert_eq!(blocks[3].chunking, BlockChunking::PsIrb8Bim);
    assert_eq!(blocks[3].data_offset, (ps_seg_off + 4 + 14) as u64);
    assert_eq!(blocks[3].data_size, 4);
}

fn png_chunk(fourcc: &[u8; 4], data: &[u8]) -> Vec<u8> {
    let mut c = (data.len() as u32).to_be_bytes().to_vec();
    c.extend_from_slice(fourcc);
    c.extend_from_slice(data);
    c.extend_from_slice(&[0, 0, 0, 0]);
    c
}

#[test]
fn png_chunk_compression_markers() {
    let signature = [0x89, b'P', b'N', b'G', 0x0D, 0x0A, 0x1A, 0x0A];
    let mut file = signature.to_vec();

    let mut plain_itxt = b"XML:com.adobe.xmp\x00".to_vec();
    plain_itxt.extend_from_slice(&[0, 0, 0, 0]); // uncompressed, no lang/translated
    plain_itxt.extend_from_slice(b"<xmp/>");
    file.extend_from_slice(&png_chunk(b"iTXt", &plain_itxt));

    let mut packed_itxt = b"XML:com.adobe.xmp\x00".to_vec();
    packed_itxt.extend_from_slice(&[1, 0, 0, 0]); // compressed
    packed_itxt.extend_from_slice(b"Z");
    file.extend_from_slice(&png_chunk(b"iTXt", &packed_itxt));

    file.extend_from_slice(&png_chunk(b"iCCP", b"icc\x00\x00Z"));
    file.extend_from_slice(&png_chunk(b"eXIf", b"II\x2A\x00\x08\x00\x00\x00"));
    file.extend_from_slice(&png_chunk(b"IEND", b""));

    let (blocks, status) = blocks_of(&file);
    assert_eq!(status, DecodeStatus::Ok);
    assert_eq!(blocks.len(), 4);
    assert_eq!(
        blocks.iter().map(|b| b.kind).collect::<Vec<_>>(),
        [BlockKind::Xmp, BlockKind::Xmp, BlockKind::Icc, BlockKind::Exif]
    );
    assert_eq!(
        blocks.iter().map(|b| b.compression).collect::<Vec<_>>(),
        [
            BlockCompression::None,
            BlockCompression::Deflate,
            BlockCompression::Deflate,
            BlockCompression::None
        ]
    );
}

#[test]
fn webp_chunks_in_order() {
    let chunks: &[(&[u8; 4], &[u8])] = &[
        (b"EXIF", b"II\x2A\x00\x08\x00\x00\x00"),
        (b"XMP ", b"<xmp/>"),
        (b"ICCP", b"prof!"),
    ];
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

    let (blocks, status) = blocks_of(&file);
    assert_eq!(status, DecodeStatus::Ok);
    assert_eq!(blocks.len(), 3);
    assert_eq!(
        blocks.iter().map(|b| b.kind).collect::<Vec<_>>(),
        [BlockKind::Exif, BlockKind::Xmp, BlockKind::Icc]
    );
    // Payloads start right after each 8-byte chunk header.
    assert_eq!(blocks[0].data_offset, 12 + 8);
    assert_eq!(blocks[1].data_offset, blocks[0].data_offset + 8 + 8);
}

mod bmff {
    use super::*;

    fn boxed(fourcc: &[u8; 4], payload: &[u8]) -> Vec<u8> {
        let mut b = ((payload.len() + 8) as u32).to_be_bytes().to_vec();
        b.extend_from_slice(fourcc);
        b.extend_from_slice(payload);
        b
    }

    fn fullbox(fourcc: &[u8; 4], version: u8, payload: &[u8]) -> Vec<u8> {
        let mut inner = vec![version, 0, 0, 0];
        inner.extend_from_slice(payload);
        boxed(fourcc, &inner)
    }

    #[test]
    fn heif_meta_idat_items() {
        // idat: Exif item (u32 prefix + TIFF header) then an XMP packet.
        let mut idat = 0u32.to_be_bytes().to_vec();
        idat.extend_from_slice(b"II\x2A\x00\x08\x00\x00\x00");
        let exif_len = idat.len() as u32;
        let xmp_off = idat.len() as u32;
        idat.extend_from_slice(b"<rdf/>");

        let mut infe_exif = vec![2u8, 0, 0, 0];
        infe_exif.extend_from_slice(&1u16.to_be_bytes());
        infe_exif.extend_from_slice(&[0, 0]);
        infe_exif.extend_from_slice(b"Exif\0");
        let infe_exif = boxed(b"infe", &infe_exif);

        let mut infe_mime = vec![2u8, 0, 0, 0];
        infe_mime.extend_from_slice(&2u16.to_be_bytes());
        infe_mime.extend_from_slice(&[0, 0]);
        infe_mime.extend_from_slice(b"mime\0");
        infe_mime.extend_from_slice(b"application/rdf+xml\0");
        let infe_mime = boxed(b"infe", &infe_mime);

        let mut iinf_payload = 2u16.to_be_bytes().to_vec();
        iinf_payload.extend_from_slice(&infe_exif);
        iinf_payload.extend_from_slice(&infe_mime);

        // iloc v1, idat-relative extents with 4-byte offset/length fields.
        let mut iloc = vec![0x44u8, 0x00];
        iloc.extend_from_slice(&2u16.to_be_bytes());
        for (item, off, len) in [(1u16, 0u32, exif_len), (2, xmp_off, 6)] {
            iloc.extend_from_slice(&item.to_be_bytes());
            iloc.extend_from_slice(&1u16.to_be_bytes()); // construction: idat
            iloc.extend_from_slice(&0u16.to_be_bytes());
            iloc.extend_from_slice(&1u16.to_be_bytes());
            iloc.extend_from_slice(&off.to_be_bytes());
            iloc.extend_from_slice(&len.to_be_bytes());
        }

        let mut meta_payload = fullbox(b"iinf", 0, &iinf_payload);
        meta_payload.extend_from_slice(&fullbox(b"iloc", 1, &iloc));
        meta_payload.extend_from_slice(&boxed(b"idat", &idat));

        let mut file = boxed(b"ftyp", b"heicmif1");
        file.extend_from_slice(&fullbox(b"meta", 0, &meta_payload));

        let (blocks, status) = blocks_of(&file);
        assert_eq!(status, DecodeStatus::Ok);
        assert_eq!(blocks.len(), 2);
        assert_eq!(blocks[0].kind, BlockKind::Exif);
        assert_eq!(blocks[0].format, ContainerFormat::Heif);
        assert_eq!(blocks[0].chunking, BlockChunking::BmffExifTiffOffsetU32Be);
        assert_eq!(
            &file[blocks[0].data_offset as usize..][..4],
            b"II\x2A\x00"
        );
        assert_eq!(blocks[1].kind, BlockKind::Xmp);
        assert_eq!(
            &file[blocks[1].data_offset as usize..][..blocks[1].data_size as usize],
            b"<rdf/>"
        );
    }
}

#[test]
fn tiff_three_blocks() {
    let mut file = b"II\x2A\x00\x08\x00\x00\x00".to_vec();
    file.extend_from_slice(&2u16.to_le_bytes());
    // 0x02BC BYTE[5] -> out-of-line at 38
    file.extend_from_slice(&0x02BCu16.to_le_bytes());
    file.extend_from_slice(&1u16.to_le_bytes());
    file.extend_from_slice(&5u32.to_le_bytes());
    file.extend_from_slice(&38u32.to_le_bytes());
    // 0x8773 UNDEFINED[4] inline "ABCD"
    file.extend_from_slice(&0x8773u16.to_le_bytes());
    file.extend_from_slice(&7u16.to_le_bytes());
    file.extend_from_slice(&4u32.to_le_bytes());
    file.extend_from_slice(b"ABCD");
    file.extend_from_slice(&0u32.to_le_bytes());
    file.extend_from_slice(b"<xmp>");

    let (blocks, status) = blocks_of(&file);
    assert_eq!(status, DecodeStatus::Ok);
    assert_eq!(blocks.len(), 3);
    assert_eq!(blocks[0].kind, BlockKind::Exif);
    assert_eq!(blocks[0].data_size, file.len() as u64);
    assert_eq!(blocks[1].kind, BlockKind::Xmp);
    assert_eq!(&file[blocks[1].data_offset as usize..][..5], b"<xmp>");
    assert_eq!(blocks[2].kind, BlockKind::Icc);
    assert_eq!(&file[blocks[2].data_offset as usize..][..4], b"ABCD");
}

/// Re-running with `buffer.len == needed` turns `OutputTruncated` into `Ok`
/// with identical content.
#[test]
fn monotone_buffering() {
    let mut file = vec![0xFF, 0xD8];
    for i in 0..3u8 {
        let mut icc = b"ICC_PROFILE\x00".to_vec();
        icc.push(i + 1);
        icc.push(3);
        icc.extend_from_slice(b"segment");
        file.extend_from_slice(&jpeg_segment(0xE2, &icc));
    }
    file.extend_from_slice(&[0xFF, 0xD9]);

    let mut small = [BlockRef::default(); 1];
    let first = scan_auto(&file, &mut small);
    assert_eq!(first.status, DecodeStatus::OutputTruncated);
    assert_eq!(first.written, 1);
    assert_eq!(first.needed, 3);

    let mut exact = vec![BlockRef::default(); first.needed as usize];
    let second = scan_auto(&file, &mut exact);
    assert_eq!(second.status, DecodeStatus::Ok);
    assert_eq!(second.written, 3);
    assert_eq!(exact[0].data_offset, small[0].data_offset);
    assert_eq!(exact[0].data_size, small[0].data_size);
}

/// Identical inputs produce identical block lists.
#[test]
fn scan_is_deterministic() {
    let mut file = vec![0xFF, 0xD8];
    let mut exif = b"Exif\x00\x00".to_vec();
    exif.extend_from_slice(b"MM\x00\x2A\x00\x00\x00\x08");
    file.extend_from_slice(&jpeg_segment(0xE1, &exif));
    file.extend_from_slice(&[0xFF, 0xD9]);

    let (a, _) = blocks_of(&file);
    let (b, _) = blocks_of(&file);
    assert_eq!(a.len(), b.len());
    for (x, y) in a.iter().zip(&b) {
        assert_eq!(x.data_offset, y.data_offset);
        assert_eq!(x.data_size, y.data_size);
        assert_eq!(x.kind, y.kind);
    }
}
