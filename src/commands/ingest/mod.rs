use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet};
use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;

use anyhow::{Context, Result, bail};
use chrono::{NaiveDate, Utc};
use docx_rs::{
    DocumentChild, Paragraph, ParagraphChild, Run, RunChild, Table, TableCellContent, TableChild,
    TableRowChild,
};
use lopdf::content::{Content, Operation};
use lopdf::{Document, Object, ObjectId};
use regex::Regex;
use rusqlite::types::Value;
use rusqlite::{Connection, OptionalExtension, params, params_from_iter};
use tracing::{debug, info, warn};

use crate::cli::{IngestArgs, OcrMode};
use crate::commands::inventory::{
    ReportFormat, classify_report, discover_report_files, report_filename, report_format,
};
use crate::config::{
    COMMENT_KEY, GLYCOL_KEY, HeaderFieldSettings, INDEX_KEY, ParserConfig, PositionalScheme,
    RuledLineSettings, SYSTEM_NAME_KEY, SYSTEM_TYPE_KEY, TextAlignmentSettings, Vocabulary,
    WordClusterSettings,
};
use crate::model::{
    DocumentRunEntry, DocumentStatus, IngestCounts, IngestPaths, IngestRunManifest, PageRunEntry,
    ReportKind, ToolVersions,
};
use crate::util::{
    collapse_whitespace, ensure_directory, now_utc_string, sha256_file, utc_compact_string,
    write_json_pretty, write_lines,
};

pub(crate) const DB_SCHEMA_VERSION: &str = "1.0.0";

mod assemble;
mod coerce;
mod db_setup;
mod docx_extract;
mod header_fields;
mod locate;
mod locate_ruled;
mod locate_words;
mod normalize;
mod page_layout;
mod pdf_extract;
mod persist;
mod pipeline;
mod run;
#[cfg(test)]
mod tests;

pub use run::run;

pub(crate) use db_setup::{READINGS_FIXED_COLUMNS, count_rows, table_columns};
#[cfg(test)]
pub(crate) use db_setup::ensure_schema;

use assemble::*;
use coerce::*;
use db_setup::*;
use docx_extract::*;
use header_fields::*;
use locate::*;
use locate_ruled::*;
use locate_words::*;
use normalize::*;
use page_layout::*;
use pdf_extract::*;
use persist::*;
use pipeline::*;
