use super::*;

/// How the assembler should read a located grid.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum GridLayout {
    /// First row is a header of unknown trustworthiness; exact-header or
    /// positional assembly decides.
    Tabular,
    /// First row names the columns and is authoritative.
    Labeled,
    /// Rows of `[index, type, name, values...]` with no header row.
    Headerless,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum StrategyKind {
    NativeTable,
    RuledLines,
    TextAlignment,
    WordClusters,
    LinePattern,
    VerticalLabelRun,
}

impl StrategyKind {
    pub(crate) fn as_str(self) -> &'static str {
        match self {
            Self::NativeTable => "native_table",
            Self::RuledLines => "ruled_lines",
            Self::TextAlignment => "text_alignment",
            Self::WordClusters => "word_clusters",
            Self::LinePattern => "line_pattern",
            Self::VerticalLabelRun => "vertical_label_run",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub(crate) struct LocatedTable {
    pub(crate) strategy: StrategyKind,
    pub(crate) layout: GridLayout,
    pub(crate) grid: Grid,
}

/// One table-location technique. Implementations return `None` when they
/// find nothing usable on the page; the locator then tries the next one.
pub(crate) trait TableStrategy {
    fn kind(&self) -> StrategyKind;

    fn layout(&self) -> GridLayout {
        GridLayout::Tabular
    }

    fn try_extract(&self, page: &PageSection) -> Option<Grid>;
}

/// Ordered chain of strategies, most reliable first.
pub(crate) struct TableLocator {
    strategies: Vec<Box<dyn TableStrategy>>,
}

impl TableLocator {
    pub(crate) fn new(config: &ParserConfig, normalizer: &ColumnNormalizer) -> Result<Self> {
        let strategies: Vec<Box<dyn TableStrategy>> = vec![
            Box::new(NativeTableStrategy {
                normalizer: normalizer.clone(),
            }),
            Box::new(RuledLineStrategy {
                settings: config.ruled_lines.clone(),
            }),
            Box::new(TextAlignmentStrategy {
                ruled: config.ruled_lines.clone(),
                settings: config.text_alignment.clone(),
            }),
            Box::new(WordClusterStrategy {
                settings: config.word_clustering.clone(),
            }),
            Box::new(LinePatternStrategy::new()?),
            Box::new(VerticalLabelRunStrategy::new(
                normalizer.clone(),
                &config.vocabulary,
            )?),
        ];
        Ok(Self { strategies })
    }

    pub(crate) fn with_strategies(strategies: Vec<Box<dyn TableStrategy>>) -> Self {
        Self { strategies }
    }

    /// First grid with a header and at least one data row (or, for
    /// headerless grids, at least one row).
    pub(crate) fn locate(&self, page: &PageSection) -> Option<LocatedTable> {
        for strategy in &self.strategies {
            let kind = strategy.kind();
            let layout = strategy.layout();
            match strategy.try_extract(page) {
                Some(grid) if grid_is_usable(&grid, layout) => {
                    debug!(
                        page = page.number,
                        strategy = kind.as_str(),
                        rows = grid.len(),
                        "table located"
                    );
                    return Some(LocatedTable {
                        strategy: kind,
                        layout,
                        grid,
                    });
                }
                Some(grid) => {
                    debug!(
                        page = page.number,
                        strategy = kind.as_str(),
                        rows = grid.len(),
                        "too few rows; trying next strategy"
                    );
                }
                None => {
                    debug!(
                        page = page.number,
                        strategy = kind.as_str(),
                        "no table; trying next strategy"
                    );
                }
            }
        }
        None
    }
}

fn grid_is_usable(grid: &Grid, layout: GridLayout) -> bool {
    let rows = grid
        .iter()
        .filter(|row| row.iter().any(|cell| !cell.trim().is_empty()))
        .count();
    match layout {
        GridLayout::Headerless => rows >= 1,
        GridLayout::Tabular | GridLayout::Labeled => rows >= 2,
    }
}

/// Picks the word-processor table whose header names measurements.
pub(crate) struct NativeTableStrategy {
    pub(crate) normalizer: ColumnNormalizer,
}

/// Header rows naming at least this many known metrics mark a
/// measurements table.
const MIN_NATIVE_HEADER_METRICS: usize = 2;

impl TableStrategy for NativeTableStrategy {
    fn kind(&self) -> StrategyKind {
        StrategyKind::NativeTable
    }

    fn layout(&self) -> GridLayout {
        GridLayout::Labeled
    }

    fn try_extract(&self, page: &PageSection) -> Option<Grid> {
        page.native_tables
            .iter()
            .find(|table| {
                let Some(header) = table.first() else {
                    return false;
                };
                if table.len() < 2 {
                    return false;
                }
                let metric_labels = header
                    .iter()
                    .filter(|cell| self.normalizer.is_metric_label(cell))
                    .count();
                let names_systems = header
                    .first()
                    .is_some_and(|cell| self.normalizer.normalize(cell) == SYSTEM_NAME_KEY);
                metric_labels >= MIN_NATIVE_HEADER_METRICS
                    || (names_systems && metric_labels >= 1)
            })
            .cloned()
    }
}

/// Matches a row start: an index followed by text, a bare index, or a dash.
const ROW_START_PATTERN: &str = r"^\d+ |^\d+$|^-";
/// Whole-line value tokens: numbers, decimals, glycol percentage/freeze
/// pairs such as `30%/-10`, and the `.` blank placeholder.
const VALUE_LINE_PATTERN: &str = r"^(?:\d+(?:\.\d*)?|\.\d+|\d+%/-?\d+|\.)$";

/// Reads rows out of plain text where each cell sits on its own line:
/// an index line (optionally followed by the system type), a system name
/// line, then value lines until something else appears.
pub(crate) struct LinePatternStrategy {
    row_start: Regex,
    value_line: Regex,
    leading_numeric: Regex,
}

impl LinePatternStrategy {
    pub(crate) fn new() -> Result<Self> {
        Ok(Self {
            row_start: Regex::new(ROW_START_PATTERN).context("failed to compile row start regex")?,
            value_line: Regex::new(VALUE_LINE_PATTERN)
                .context("failed to compile value line regex")?,
            leading_numeric: Regex::new(r"^\d+\.?\d*|^-")
                .context("failed to compile leading numeric regex")?,
        })
    }

    pub(crate) fn parse_lines(&self, lines: &[&str]) -> Grid {
        let mut grid = Vec::new();
        let mut index = 0;

        while index < lines.len() {
            let line = lines[index];
            if !self.row_start.is_match(line) {
                index += 1;
                continue;
            }

            let mut parts = line.split_whitespace();
            let marker = parts.next().unwrap_or_default().to_string();
            let system_type = parts.collect::<Vec<&str>>().join(" ");
            let mut row = vec![marker, system_type];
            index += 1;

            match lines.get(index) {
                Some(next) if !self.leading_numeric.is_match(next) => {
                    row.push(next.to_string());
                    index += 1;
                }
                _ => row.push(String::new()),
            }

            while let Some(next) = lines.get(index) {
                if !self.value_line.is_match(next) {
                    break;
                }
                row.push(next.to_string());
                index += 1;
            }

            grid.push(row);
        }

        grid
    }
}

impl TableStrategy for LinePatternStrategy {
    fn kind(&self) -> StrategyKind {
        StrategyKind::LinePattern
    }

    fn layout(&self) -> GridLayout {
        GridLayout::Headerless
    }

    fn try_extract(&self, page: &PageSection) -> Option<Grid> {
        let grid = self.parse_lines(&page.lines());
        (!grid.is_empty()).then_some(grid)
    }
}

/// Reads blocks laid out as a header token, a run of metric labels (one per
/// line), then per sample an identifier followed by one value per label.
pub(crate) struct VerticalLabelRunStrategy {
    normalizer: ColumnNormalizer,
    header_tokens: Vec<String>,
    range_marker: String,
    numeric_line: Regex,
}

impl VerticalLabelRunStrategy {
    pub(crate) fn new(normalizer: ColumnNormalizer, vocabulary: &Vocabulary) -> Result<Self> {
        Ok(Self {
            normalizer,
            header_tokens: vocabulary.vertical_header_tokens.clone(),
            range_marker: vocabulary.range_marker.clone(),
            numeric_line: Regex::new(r"^[-+<>~]?\s*\.?\d")
                .context("failed to compile numeric line regex")?,
        })
    }

    fn is_header_token(&self, line: &str) -> bool {
        self.header_tokens
            .iter()
            .any(|token| line.eq_ignore_ascii_case(token.trim()))
    }

    fn is_range_line(&self, line: &str) -> bool {
        !self.range_marker.is_empty()
            && line
                .to_ascii_lowercase()
                .starts_with(&self.range_marker.to_ascii_lowercase())
    }

    pub(crate) fn parse_lines(&self, lines: &[&str]) -> Grid {
        let Some(header_index) = lines.iter().position(|line| self.is_header_token(line)) else {
            return Vec::new();
        };

        let mut index = header_index + 1;
        let mut labels = Vec::new();
        while let Some(line) = lines.get(index) {
            if !self.normalizer.is_metric_label(line) {
                break;
            }
            labels.push(line.to_string());
            index += 1;
        }

        let column_count = labels.len();
        if column_count == 0 {
            return Vec::new();
        }

        let mut header = Vec::with_capacity(column_count + 1);
        header.push(lines[header_index].to_string());
        header.extend(labels);
        let mut grid = vec![header];

        while index < lines.len() {
            let line = lines[index];
            if self.is_header_token(line) {
                break;
            }
            if self.is_range_line(line) {
                index += 1 + column_count;
                continue;
            }

            let mut identifier = Vec::new();
            while let Some(next) = lines.get(index) {
                if self.numeric_line.is_match(next)
                    || self.is_range_line(next)
                    || self.is_header_token(next)
                {
                    break;
                }
                identifier.push(next.to_string());
                index += 1;
            }
            if identifier.is_empty() {
                identifier.push(line.to_string());
                index += 1;
            }

            if index + column_count > lines.len() {
                break;
            }

            let mut row = vec![identifier.join(" ")];
            row.extend(
                lines[index..index + column_count]
                    .iter()
                    .map(|value| value.to_string()),
            );
            index += column_count;
            grid.push(row);
        }

        grid
    }
}

impl TableStrategy for VerticalLabelRunStrategy {
    fn kind(&self) -> StrategyKind {
        StrategyKind::VerticalLabelRun
    }

    fn layout(&self) -> GridLayout {
        GridLayout::Labeled
    }

    fn try_extract(&self, page: &PageSection) -> Option<Grid> {
        let grid = self.parse_lines(&page.lines());
        (!grid.is_empty()).then_some(grid)
    }
}
