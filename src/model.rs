use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReportKind {
    Docx,
    PdfText,
    PdfScanned,
    Unsupported,
    Empty,
}

impl ReportKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Docx => "docx",
            Self::PdfText => "pdf_text",
            Self::PdfScanned => "pdf_scanned",
            Self::Unsupported => "unsupported",
            Self::Empty => "empty",
        }
    }

    pub fn is_ingestible(self) -> bool {
        matches!(self, Self::Docx | Self::PdfText | Self::PdfScanned)
    }
}

/// Producer application hint sniffed from PDF metadata.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PdfOrigin {
    Spreadsheet,
    WordProcessor,
    Unknown,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReportEntry {
    pub filename: String,
    pub relative_path: String,
    pub kind: ReportKind,
    pub origin: Option<PdfOrigin>,
    pub producer: Option<String>,
    pub creator: Option<String>,
    pub size_bytes: u64,
    pub sha256: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReportInventoryManifest {
    pub manifest_version: u32,
    pub generated_at: String,
    pub source_directory: String,
    pub recursive: bool,
    pub report_count: usize,
    pub reports: Vec<ReportEntry>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ToolVersions {
    pub pdftotext: Option<String>,
    pub pdftoppm: Option<String>,
    pub tesseract: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct IngestPaths {
    pub input_dir: String,
    pub manifest_dir: String,
    pub db_path: String,
    pub run_log_path: String,
    pub config_path: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct IngestCounts {
    pub file_count: usize,
    pub processed_count: usize,
    pub skipped_unsupported_count: usize,
    pub skipped_complete_count: usize,
    pub resumed_count: usize,
    pub failed_count: usize,
    pub documents_inserted: usize,
    pub systems_inserted: usize,
    pub systems_duplicate: usize,
    pub systems_failed: usize,
    pub rows_dropped: usize,
    pub unmapped_labels: usize,
    pub glycol_relocations: usize,
    pub pages_without_table: usize,
    pub ocr_page_count: usize,
    pub documents_total: i64,
    pub systems_total: i64,
    pub metrics_total: i64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DocumentStatus {
    Ingested,
    Resumed,
    SkippedComplete,
    SkippedUnsupported,
    Failed,
}

impl DocumentStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Ingested => "ingested",
            Self::Resumed => "resumed",
            Self::SkippedComplete => "skipped_complete",
            Self::SkippedUnsupported => "skipped_unsupported",
            Self::Failed => "failed",
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct PageRunEntry {
    pub page: usize,
    pub strategy: Option<String>,
    pub systems: usize,
}

#[derive(Debug, Clone, Serialize)]
pub struct DocumentRunEntry {
    pub filename: String,
    pub status: DocumentStatus,
    pub pages: Vec<PageRunEntry>,
    pub systems_inserted: usize,
    pub systems_duplicate: usize,
    pub systems_failed: usize,
    pub rows_dropped: usize,
    pub unmapped_labels: Vec<String>,
    pub glycol_relocations: usize,
    pub ocr_pages: usize,
    pub missing_fields: Vec<String>,
    pub technician_placeholder: bool,
    pub warnings: Vec<String>,
    pub error: Option<String>,
}

impl DocumentRunEntry {
    pub fn new(filename: &str, status: DocumentStatus) -> Self {
        Self {
            filename: filename.to_string(),
            status,
            pages: Vec::new(),
            systems_inserted: 0,
            systems_duplicate: 0,
            systems_failed: 0,
            rows_dropped: 0,
            unmapped_labels: Vec::new(),
            glycol_relocations: 0,
            ocr_pages: 0,
            missing_fields: Vec::new(),
            technician_placeholder: false,
            warnings: Vec::new(),
            error: None,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct IngestRunManifest {
    pub manifest_version: u32,
    pub run_id: String,
    pub db_schema_version: String,
    pub status: String,
    pub started_at: String,
    pub updated_at: String,
    pub command: String,
    pub tool_versions: ToolVersions,
    pub paths: IngestPaths,
    pub counts: IngestCounts,
    pub documents: Vec<DocumentRunEntry>,
    pub warnings: Vec<String>,
}
