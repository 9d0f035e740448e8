//! metadump - dump decoded metadata entries for image files.
//!
//! Walks the full read pipeline per file: container scan, EXIF/TIFF decode
//! (MakerNotes included), payload collection. Prints one line per entry,
//! or JSON with `--json`. Batch failures keep going; the exit code is
//! non-zero if any file failed.

mod render;

use std::io::Read;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::Parser;
use openmeta_core::{DecodeStatus, MetaStore};
use openmeta_formats::{
    simple_meta_read, BlockCompression, BlockRef, ExifDecodeOptions, IfdRef, PayloadError,
    PayloadOptions, PayloadPart, SimpleMetaResult,
};
use tracing::debug;
use walkdir::WalkDir;

#[derive(Debug, Parser)]
#[command(name = "metadump", version, about = "Dump image metadata entries")]
struct Args {
    /// Files or directories to dump.
    #[arg(required = true)]
    paths: Vec<PathBuf>,

    /// Recurse into directories.
    #[arg(short, long)]
    recursive: bool,

    /// Emit JSON instead of text lines.
    #[arg(long)]
    json: bool,

    /// Only print entries of this IFD token (e.g. `ifd0`, `exif`,
    /// `mk_canon_0`).
    #[arg(long)]
    ifd: Option<String>,

    /// Skip vendor MakerNote decoding.
    #[arg(long)]
    no_makernote: bool,

    /// Skip GeoTIFF key derivation.
    #[arg(long)]
    no_geotiff: bool,

    /// Skip deflate decompression of compressed payloads.
    #[arg(long)]
    no_decompress: bool,

    /// Cap on one value's payload bytes.
    #[arg(long, default_value_t = 1 << 20)]
    max_value_bytes: u32,

    /// Cap on total decoded entries per file.
    #[arg(long, default_value_t = 4096)]
    max_entries: u32,

    /// Refuse files larger than this.
    #[arg(long, default_value_t = 1 << 30)]
    max_file_bytes: u64,

    /// Increase log verbosity (-v, -vv).
    #[arg(short, action = clap::ArgAction::Count)]
    verbose: u8,
}

fn main() -> std::process::ExitCode {
    let args = Args::parse();
    init_tracing(args.verbose);

    let mut exit = std::process::ExitCode::SUCCESS;
    for path in collect_files(&args) {
        match dump_file(&path, &args) {
            Ok(ok) if ok => {}
            Ok(_) => exit = std::process::ExitCode::FAILURE,
            Err(err) => {
                eprintln!("metadump: {}: {err:#}", path.display());
                exit = std::process::ExitCode::FAILURE;
            }
        }
    }
    exit
}

fn init_tracing(verbose: u8) {
    let filter = match verbose {
        0 => "warn",
        1 => "info",
        _ => "debug",
    };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(filter)),
        )
        .with_writer(std::io::stderr)
        .init();
}

fn collect_files(args: &Args) -> Vec<PathBuf> {
    let mut files = Vec::new();
    for path in &args.paths {
        if path.is_dir() {
            if args.recursive {
                for entry in WalkDir::new(path).into_iter().filter_map(|e| e.ok()) {
                    if entry.file_type().is_file() {
                        files.push(entry.into_path());
                    }
                }
            } else {
                eprintln!(
                    "metadump: {} is a directory (use --recursive)",
                    path.display()
                );
            }
        } else {
            files.push(path.clone());
        }
    }
    files
}

/// Deflate payload decompressor; brotli is reported unsupported.
fn decompress_payload(
    compression: BlockCompression,
    input: &[u8],
) -> std::result::Result<Vec<u8>, PayloadError> {
    match compression {
        BlockCompression::Deflate => {
            let mut out = Vec::new();
            flate2::read::ZlibDecoder::new(input)
                .read_to_end(&mut out)
                .map_err(|e| PayloadError::CorruptStream(e.to_string()))?;
            Ok(out)
        }
        _ => Err(PayloadError::UnsupportedCompression),
    }
}

/// Returns Ok(false) when the file decoded with a non-Ok status.
fn dump_file(path: &Path, args: &Args) -> Result<bool> {
    let metadata = std::fs::metadata(path)
        .with_context(|| format!("stat {}", path.display()))?;
    if metadata.len() > args.max_file_bytes {
        anyhow::bail!("file exceeds --max-file-bytes ({} bytes)", metadata.len());
    }
    let bytes = std::fs::read(path).with_context(|| format!("read {}", path.display()))?;

    let exif_options = ExifDecodeOptions {
        limits: openmeta_formats::ExifDecodeLimits {
            max_value_bytes: args.max_value_bytes,
            max_total_entries: args.max_entries,
            ..Default::default()
        },
        decode_makernote: !args.no_makernote,
        decode_geotiff: !args.no_geotiff,
        ..Default::default()
    };
    let decompress: openmeta_formats::PayloadDecompressFn<'_> = &decompress_payload;
    let payload_options = PayloadOptions {
        decompress: (!args.no_decompress).then_some(decompress),
        kinds: Vec::new(),
    };

    // Grow-and-retry over every caller buffer until nothing truncates.
    let mut blocks = vec![BlockRef::default(); 32];
    let mut ifd_refs = vec![IfdRef::default(); 8];
    let mut payload = vec![0u8; 1 << 16];
    let mut parts = vec![PayloadPart::default(); 16];
    let mut store;
    let mut result: SimpleMetaResult;
    loop {
        store = MetaStore::new();
        result = simple_meta_read(
            &bytes,
            &mut store,
            &mut blocks,
            &mut ifd_refs,
            &mut payload,
            &mut parts,
            &exif_options,
            &payload_options,
        );
        if result.status != DecodeStatus::OutputTruncated {
            break;
        }
        let grew = grow(&mut blocks, result.blocks_needed as usize)
            | grow(&mut ifd_refs, result.ifd_refs_needed as usize)
            | grow(&mut parts, result.parts_needed as usize)
            | grow_bytes(&mut payload, result.payload_needed as usize);
        if !grew {
            break;
        }
        debug!(path = %path.display(), "retrying with grown buffers");
    }

    let report = render::build_report(path, &store, &result, &parts[..result.parts_written as usize], args.ifd.as_deref());
    if args.json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        render::print_text(&report);
    }

    Ok(result.status == DecodeStatus::Ok)
}

fn grow<T: Clone + Default>(buf: &mut Vec<T>, needed: usize) -> bool {
    if needed > buf.len() {
        buf.resize(needed, T::default());
        true
    } else {
        false
    }
}

fn grow_bytes(buf: &mut Vec<u8>, needed: usize) -> bool {
    if needed > buf.len() {
        buf.resize(needed, 0);
        true
    } else {
        false
    }
}
