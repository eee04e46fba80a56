use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use lopdf::{Document, Object};
use tracing::{info, warn};

use crate::cli::InventoryArgs;
use crate::model::{PdfOrigin, ReportEntry, ReportInventoryManifest, ReportKind};
use crate::util::{now_utc_string, sha256_file, write_json_pretty};

/// Pages whose text layer has fewer non-whitespace characters than this
/// are treated as scanned.
const MIN_TEXT_CHARS: usize = 30;

const RECYCLE_BIN: &str = "$RECYCLE.BIN";

pub fn run(args: InventoryArgs) -> Result<()> {
    let manifest = build_manifest(&args.input_dir, args.recursive)?;

    for kind in [
        ReportKind::Docx,
        ReportKind::PdfText,
        ReportKind::PdfScanned,
        ReportKind::Unsupported,
        ReportKind::Empty,
    ] {
        let count = manifest
            .reports
            .iter()
            .filter(|report| report.kind == kind)
            .count();
        info!(kind = kind.as_str(), count, "inventory classification");
    }

    if args.dry_run {
        info!(
            report_count = manifest.report_count,
            source = %manifest.source_directory,
            "inventory dry-run complete"
        );
        return Ok(());
    }

    let manifest_path = args.manifest_path.unwrap_or_else(|| {
        args.input_dir
            .join("manifests")
            .join("report_inventory.json")
    });

    write_json_pretty(&manifest_path, &manifest)?;
    info!(path = %manifest_path.display(), "wrote inventory manifest");
    info!(report_count = manifest.report_count, "inventory completed");

    Ok(())
}

pub fn build_manifest(input_dir: &Path, recursive: bool) -> Result<ReportInventoryManifest> {
    let paths = discover_report_files(input_dir, recursive)?;

    let mut reports = Vec::with_capacity(paths.len());
    for path in paths {
        let filename = report_filename(&path)?;
        let relative_path = path
            .strip_prefix(input_dir)
            .unwrap_or(&path)
            .display()
            .to_string();
        let size_bytes = fs::metadata(&path)
            .with_context(|| format!("failed to stat {}", path.display()))?
            .len();

        let kind = classify_report(&path, size_bytes);
        let sha256 = if kind == ReportKind::Empty {
            None
        } else {
            Some(sha256_file(&path)?)
        };

        let (origin, producer, creator) = if matches!(kind, ReportKind::PdfText | ReportKind::PdfScanned) {
            pdf_origin(&path)
        } else {
            (None, None, None)
        };

        reports.push(ReportEntry {
            filename,
            relative_path,
            kind,
            origin,
            producer,
            creator,
            size_bytes,
            sha256,
        });
    }

    Ok(ReportInventoryManifest {
        manifest_version: 1,
        generated_at: now_utc_string(),
        source_directory: input_dir.display().to_string(),
        recursive,
        report_count: reports.len(),
        reports,
    })
}

pub(crate) fn report_filename(path: &Path) -> Result<String> {
    path.file_name()
        .and_then(|name| name.to_str())
        .map(ToOwned::to_owned)
        .with_context(|| format!("invalid UTF-8 filename: {}", path.display()))
}

/// Every regular file under `input_dir`, sorted. Recursion skips the
/// Windows recycle bin and the manifest directory.
pub(crate) fn discover_report_files(input_dir: &Path, recursive: bool) -> Result<Vec<PathBuf>> {
    let mut files = Vec::new();
    let mut pending = vec![input_dir.to_path_buf()];

    while let Some(directory) = pending.pop() {
        let entries = fs::read_dir(&directory)
            .with_context(|| format!("failed to read {}", directory.display()))?;

        for entry in entries {
            let entry = entry
                .with_context(|| format!("failed to read entry in {}", directory.display()))?;
            let path = entry.path();
            let file_type = entry
                .file_type()
                .with_context(|| format!("failed to inspect file type: {}", path.display()))?;

            if file_type.is_dir() {
                let name = entry.file_name().to_string_lossy().to_uppercase();
                if recursive && name != RECYCLE_BIN && name != "MANIFESTS" {
                    pending.push(path);
                }
                continue;
            }

            if file_type.is_file() {
                files.push(path);
            }
        }
    }

    files.sort();
    Ok(files)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum ReportFormat {
    Docx,
    Pdf,
}

/// Supported format by extension. Word lock files (`~$name.docx`) are not
/// reports.
pub(crate) fn report_format(path: &Path) -> Option<ReportFormat> {
    let name = path.file_name().and_then(|name| name.to_str())?;
    if name.starts_with("~$") {
        return None;
    }
    let extension = path.extension().and_then(|ext| ext.to_str())?;
    if extension.eq_ignore_ascii_case("docx") {
        Some(ReportFormat::Docx)
    } else if extension.eq_ignore_ascii_case("pdf") {
        Some(ReportFormat::Pdf)
    } else {
        None
    }
}

pub(crate) fn classify_report(path: &Path, size_bytes: u64) -> ReportKind {
    if size_bytes == 0 {
        return ReportKind::Empty;
    }
    match report_format(path) {
        None => ReportKind::Unsupported,
        Some(ReportFormat::Docx) => ReportKind::Docx,
        Some(ReportFormat::Pdf) => match Document::load(path) {
            Ok(document) => {
                if looks_like_scanned(&document) || !has_text_layer(&document) {
                    ReportKind::PdfScanned
                } else {
                    ReportKind::PdfText
                }
            }
            Err(error) => {
                warn!(
                    filename = %path.display(),
                    error = %error,
                    "PDF structure unreadable; classifying by extension"
                );
                ReportKind::PdfText
            }
        },
    }
}

/// Every page carries images but no fonts.
fn looks_like_scanned(document: &Document) -> bool {
    let pages = document.get_pages();
    if pages.is_empty() {
        return false;
    }

    let mut image_only_pages = 0;
    for object_id in pages.values() {
        let Ok(page) = document.get_object(*object_id).and_then(Object::as_dict) else {
            continue;
        };
        let resources = page
            .get(b"Resources")
            .ok()
            .and_then(|resources| document.dereference(resources).ok())
            .and_then(|(_, resolved)| resolved.as_dict().ok());

        let has_resource = |key: &[u8]| {
            resources
                .and_then(|resources| resources.get(key).ok())
                .and_then(|entry| document.dereference(entry).ok())
                .and_then(|(_, resolved)| resolved.as_dict().ok())
                .is_some_and(|dict| !dict.is_empty())
        };

        if has_resource(b"XObject") && !has_resource(b"Font") {
            image_only_pages += 1;
        }
    }

    image_only_pages == pages.len()
}

fn has_text_layer(document: &Document) -> bool {
    let page_numbers = document.get_pages().keys().copied().collect::<Vec<u32>>();
    document
        .extract_text(&page_numbers)
        .map(|text| text.chars().filter(|character| !character.is_whitespace()).count())
        .is_ok_and(|count| count >= MIN_TEXT_CHARS)
}

/// Producer-application hint from the document information dictionary,
/// falling back to a content marker only word-processor reports carry.
fn pdf_origin(path: &Path) -> (Option<PdfOrigin>, Option<String>, Option<String>) {
    let Ok(document) = Document::load(path) else {
        return (Some(PdfOrigin::Unknown), None, None);
    };

    let info = document
        .trailer
        .get(b"Info")
        .ok()
        .and_then(|info| document.dereference(info).ok())
        .and_then(|(_, resolved)| resolved.as_dict().ok());
    let read_entry = |key: &[u8]| {
        info.and_then(|info| info.get(key).ok())
            .and_then(|value| value.as_str().ok())
            .map(decode_pdf_string)
    };
    let producer = read_entry(b"Producer");
    let creator = read_entry(b"Creator");

    let combined = format!(
        "{} {}",
        producer.as_deref().unwrap_or_default(),
        creator.as_deref().unwrap_or_default()
    )
    .to_lowercase();

    let origin = if ["excel", "calc", "spreadsheet", "xls"]
        .iter()
        .any(|marker| combined.contains(marker))
    {
        PdfOrigin::Spreadsheet
    } else if ["word", "writer", "docx"]
        .iter()
        .any(|marker| combined.contains(marker))
    {
        PdfOrigin::WordProcessor
    } else {
        let page_numbers = document.get_pages().keys().copied().collect::<Vec<u32>>();
        match document.extract_text(&page_numbers) {
            Ok(text) if text.contains("Comments and Recommendations:") => PdfOrigin::WordProcessor,
            _ => PdfOrigin::Unknown,
        }
    };

    (Some(origin), producer, creator)
}

/// PDF text strings are PDFDocEncoding or UTF-16BE with a byte order mark.
fn decode_pdf_string(bytes: &[u8]) -> String {
    if let Some(utf16) = bytes.strip_prefix(&[0xFE, 0xFF]) {
        let units = utf16
            .chunks_exact(2)
            .map(|pair| u16::from_be_bytes([pair[0], pair[1]]))
            .collect::<Vec<u16>>();
        return String::from_utf16_lossy(&units);
    }
    String::from_utf8_lossy(bytes).into_owned()
}
