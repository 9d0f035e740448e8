//! Entry rendering shared by the metadump output modes.

use std::path::Path;

use openmeta_core::{MetaKey, MetaStore, MetaValue, ValueKind};
use openmeta_formats::{PayloadPart, SimpleMetaResult};
use serde::Serialize;

#[derive(Debug, Serialize)]
pub struct FileReport {
    pub path: String,
    pub status: String,
    pub blocks: u32,
    pub entries: Vec<EntryReport>,
    pub payload_parts: Vec<PartReport>,
}

#[derive(Debug, Serialize)]
pub struct EntryReport {
    pub ifd: String,
    pub tag: String,
    pub wire_type: u16,
    pub count: u32,
    pub value: String,
}

#[derive(Debug, Serialize)]
pub struct PartReport {
    pub kind: String,
    pub size: u64,
    pub compression: String,
}

pub fn build_report(
    path: &Path,
    store: &MetaStore,
    result: &SimpleMetaResult,
    parts: &[PayloadPart],
    ifd_filter: Option<&str>,
) -> FileReport {
    let mut entries = Vec::new();
    for (_, entry) in store.iter() {
        let (ifd, tag) = match entry.key {
            MetaKey::ExifTag { ifd, tag } => (
                String::from_utf8_lossy(store.arena().span(ifd)).into_owned(),
                format!("0x{tag:04X}"),
            ),
            MetaKey::GeoTiffKey(id) => ("geotiff".to_string(), format!("geo:{id}")),
            MetaKey::XmpProperty { ns, name } => (
                String::from_utf8_lossy(store.arena().span(ns)).into_owned(),
                String::from_utf8_lossy(store.arena().span(name)).into_owned(),
            ),
        };
        if ifd_filter.is_some_and(|f| f != ifd) {
            continue;
        }
        entries.push(EntryReport {
            ifd,
            tag,
            wire_type: entry.origin.wire.code,
            count: entry.origin.wire_count,
            value: format_value(store, &entry.value),
        });
    }

    FileReport {
        path: path.display().to_string(),
        status: result.status.to_string(),
        blocks: result.blocks_written,
        entries,
        payload_parts: parts
            .iter()
            .map(|p| PartReport {
                kind: p.kind.name().to_string(),
                size: p.size,
                compression: format!("{:?}", p.compression).to_ascii_lowercase(),
            })
            .collect(),
    }
}

pub fn print_text(report: &FileReport) {
    println!("{}: {} ({} blocks)", report.path, report.status, report.blocks);
    for entry in &report.entries {
        println!(
            "  {:<28} {:<10} type={:<3} count={:<5} {}",
            entry.ifd, entry.tag, entry.wire_type, entry.count, entry.value
        );
    }
    for part in &report.payload_parts {
        println!("  payload {:<8} {} bytes ({})", part.kind, part.size, part.compression);
    }
}

/// Human-readable value rendering; long arrays and blobs are elided.
fn format_value(store: &MetaStore, value: &MetaValue) -> String {
    const MAX_SHOWN: u32 = 8;
    match value.kind {
        ValueKind::Empty => "(empty)".to_string(),
        ValueKind::Text => {
            let span = value.span().unwrap_or(openmeta_core::ByteSpan::EMPTY);
            format!("\"{}\"", String::from_utf8_lossy(store.arena().span(span)))
        }
        ValueKind::Bytes => format!("<{} bytes>", value.count),
        ValueKind::Scalar => value.format_simple(),
        ValueKind::Array | ValueKind::Rational => {
            let shown = value.count.min(MAX_SHOWN);
            let mut rendered: Vec<String> = Vec::with_capacity(shown as usize);
            for i in 0..shown {
                rendered.push(value.format_element(store.arena(), i));
            }
            if value.count > shown {
                format!("[{} ... x{}]", rendered.join(" "), value.count)
            } else {
                format!("[{}]", rendered.join(" "))
            }
        }
    }
}
