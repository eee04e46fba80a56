use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, ValueEnum};

#[derive(Parser, Debug)]
#[command(
    name = "fieldreport",
    version,
    about = "Water-treatment field report extraction and query tooling"
)]
pub struct Cli {
    /// TOML file with parser tolerances, header-field fallbacks and vocabulary.
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    Inventory(InventoryArgs),
    Ingest(IngestArgs),
    Status(StatusArgs),
    Query(QueryArgs),
}

#[derive(Args, Debug, Clone)]
pub struct InventoryArgs {
    #[arg(long, default_value = "reports")]
    pub input_dir: PathBuf,

    #[arg(long)]
    pub manifest_path: Option<PathBuf>,

    #[arg(long, default_value_t = false)]
    pub recursive: bool,

    #[arg(long, default_value_t = false)]
    pub dry_run: bool,
}

#[derive(Args, Debug, Clone)]
pub struct IngestArgs {
    #[arg(long, default_value = "reports")]
    pub input_dir: PathBuf,

    #[arg(long, default_value = "reports.sqlite")]
    pub db_path: PathBuf,

    #[arg(long)]
    pub manifest_dir: Option<PathBuf>,

    #[arg(long, default_value_t = false)]
    pub recursive: bool,

    #[arg(long, value_enum, default_value_t = OcrMode::Off)]
    pub ocr_mode: OcrMode,

    #[arg(long, default_value = "eng")]
    pub ocr_lang: String,

    #[arg(long, default_value_t = 40)]
    pub ocr_min_text_chars: usize,
}

#[derive(Copy, Clone, Debug, Eq, PartialEq, ValueEnum)]
pub enum OcrMode {
    Off,
    Auto,
    Force,
}

impl OcrMode {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Off => "off",
            Self::Auto => "auto",
            Self::Force => "force",
        }
    }
}

#[derive(Args, Debug, Clone)]
pub struct StatusArgs {
    #[arg(long, default_value = "reports.sqlite")]
    pub db_path: PathBuf,
}

#[derive(Args, Debug, Clone)]
pub struct QueryArgs {
    #[arg(long, default_value = "reports.sqlite")]
    pub db_path: PathBuf,

    #[arg(long, default_value_t = false)]
    pub json: bool,

    #[command(subcommand)]
    pub query: QueryCommand,
}

#[derive(Subcommand, Debug, Clone)]
pub enum QueryCommand {
    /// Total readings, distinct facilities and distinct technicians.
    Overview,
    Facilities,
    SystemTypes {
        #[arg(long)]
        facility: String,
    },
    Systems {
        #[arg(long)]
        facility: String,
        #[arg(long)]
        system_type: String,
    },
    /// Metric columns currently present in the typed readings table.
    Metrics,
    Series(SeriesArgs),
    /// Rule-based impact and improvement text for one series.
    Assess(SeriesArgs),
}

#[derive(Args, Debug, Clone)]
pub struct SeriesArgs {
    #[arg(long)]
    pub facility: String,

    #[arg(long)]
    pub system_type: String,

    #[arg(long)]
    pub system: String,

    #[arg(long)]
    pub metric: String,

    /// Inclusive lower bound, YYYY-MM-DD.
    #[arg(long)]
    pub from: Option<String>,

    /// Inclusive upper bound, YYYY-MM-DD.
    #[arg(long)]
    pub to: Option<String>,
}
