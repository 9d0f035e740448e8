//! thumdump - list and extract embedded JPEG previews/thumbnails.
//!
//! Discovers preview candidates via the EXIF IFD graph, lists them, and
//! optionally writes each to a file. Output buffers follow the
//! grow-and-retry contract, so `OutputTruncated` never reaches the user.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::Parser;
use openmeta_core::DecodeStatus;
use openmeta_formats::{
    extract_preview_candidate, scan_preview_candidates, BlockRef, PreviewCandidate,
    PreviewExtractOptions, PreviewScanOptions,
};
use serde::Serialize;

#[derive(Debug, Parser)]
#[command(name = "thumdump", version, about = "List and extract embedded previews")]
struct Args {
    /// Files to inspect.
    #[arg(required = true)]
    paths: Vec<PathBuf>,

    /// Write each candidate to DIR as `<stem>.preview<N>.jpg`.
    #[arg(long, value_name = "DIR")]
    extract: Option<PathBuf>,

    /// Only keep candidates whose payload starts with the JPEG SOI marker.
    #[arg(long)]
    require_soi: bool,

    /// Stop after the first candidate per file.
    #[arg(long)]
    first_only: bool,

    /// Cap on one extracted preview's size.
    #[arg(long, default_value_t = 128 << 20)]
    max_bytes: u64,

    /// Emit JSON instead of text lines.
    #[arg(long)]
    json: bool,
}

#[derive(Debug, Serialize)]
struct CandidateReport {
    index: usize,
    kind: String,
    file_offset: u64,
    size: u64,
    has_soi: bool,
    extracted_to: Option<String>,
}

#[derive(Debug, Serialize)]
struct FileReport {
    path: String,
    status: String,
    candidates: Vec<CandidateReport>,
}

fn main() -> std::process::ExitCode {
    let args = Args::parse();
    let mut exit = std::process::ExitCode::SUCCESS;
    for path in &args.paths {
        match dump_file(path, &args) {
            Ok(true) => {}
            Ok(false) => exit = std::process::ExitCode::FAILURE,
            Err(err) => {
                eprintln!("thumdump: {}: {err:#}", path.display());
                exit = std::process::ExitCode::FAILURE;
            }
        }
    }
    exit
}

fn dump_file(path: &Path, args: &Args) -> Result<bool> {
    let bytes = std::fs::read(path).with_context(|| format!("read {}", path.display()))?;

    let options = PreviewScanOptions { require_jpeg_soi: args.require_soi, ..Default::default() };
    let mut blocks = vec![BlockRef::default(); 32];
    let mut candidates = vec![PreviewCandidate::default(); 16];
    let mut result;
    loop {
        result = scan_preview_candidates(&bytes, &mut blocks, &mut candidates, &options);
        if result.status != DecodeStatus::OutputTruncated {
            break;
        }
        let need_blocks = blocks.len().max(blocks.len() * 2);
        let need_candidates = (result.needed as usize).max(candidates.len());
        if need_blocks == blocks.len() && need_candidates == candidates.len() {
            break;
        }
        blocks.resize(need_blocks, BlockRef::default());
        candidates.resize(need_candidates, PreviewCandidate::default());
    }

    let found = &candidates[..result.written as usize];
    let limit = if args.first_only { found.len().min(1) } else { found.len() };

    let mut report = FileReport {
        path: path.display().to_string(),
        status: result.status.to_string(),
        candidates: Vec::new(),
    };

    for (i, candidate) in found[..limit].iter().enumerate() {
        let extracted_to = match &args.extract {
            Some(dir) => Some(extract_one(&bytes, path, dir, i, candidate, args)?),
            None => None,
        };
        report.candidates.push(CandidateReport {
            index: i,
            kind: format!("{:?}", candidate.kind),
            file_offset: candidate.file_offset,
            size: candidate.size,
            has_soi: candidate.has_jpeg_soi_signature,
            extracted_to,
        });
    }

    if args.json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        println!("{}: {} ({} candidates)", report.path, report.status, report.candidates.len());
        for c in &report.candidates {
            let soi = if c.has_soi { "soi" } else { "no-soi" };
            match &c.extracted_to {
                Some(out) => println!(
                    "  #{} {} @{}+{} {} -> {}",
                    c.index, c.kind, c.file_offset, c.size, soi, out
                ),
                None => println!("  #{} {} @{}+{} {}", c.index, c.kind, c.file_offset, c.size, soi),
            }
        }
    }

    Ok(result.status == DecodeStatus::Ok)
}

fn extract_one(
    bytes: &[u8],
    path: &Path,
    dir: &Path,
    index: usize,
    candidate: &PreviewCandidate,
    args: &Args,
) -> Result<String> {
    let options = PreviewExtractOptions {
        max_output_bytes: args.max_bytes,
        require_jpeg_soi: args.require_soi,
    };
    let mut out = vec![0u8; candidate.size as usize];
    let result = extract_preview_candidate(bytes, candidate, &mut out, &options);
    if result.status != DecodeStatus::Ok {
        anyhow::bail!("extraction failed: {}", result.status);
    }
    out.truncate(result.written as usize);

    let stem = path.file_stem().and_then(|s| s.to_str()).unwrap_or("preview");
    let out_path = dir.join(format!("{stem}.preview{index}.jpg"));
    std::fs::write(&out_path, &out).with_context(|| format!("write {}", out_path.display()))?;
    Ok(out_path.display().to_string())
}
