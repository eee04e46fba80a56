use super::*;

/// One monitored system read out of a located table. `values` maps a
/// canonical metric key (or the cleaned form of an unrecognized label) to
/// the raw cell text.
#[derive(Debug, Clone, Default, PartialEq)]
pub(crate) struct SystemRecord {
    pub(crate) system_type: String,
    pub(crate) system_name: String,
    pub(crate) comment: String,
    pub(crate) values: BTreeMap<String, String>,
}

impl SystemRecord {
    pub(crate) fn value(&self, key: &str) -> Option<&str> {
        self.values.get(key).map(String::as_str)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum AssemblyMode {
    ExactHeader,
    Positional,
    Labeled,
}

impl AssemblyMode {
    pub(crate) fn as_str(self) -> &'static str {
        match self {
            Self::ExactHeader => "exact_header",
            Self::Positional => "positional",
            Self::Labeled => "labeled",
        }
    }
}

#[derive(Debug, Clone)]
pub(crate) struct Assembly {
    pub(crate) mode: AssemblyMode,
    pub(crate) records: Vec<SystemRecord>,
    pub(crate) dropped_rows: usize,
    pub(crate) unmapped_labels: BTreeSet<String>,
    pub(crate) glycol_relocations: usize,
}

impl Assembly {
    fn new(mode: AssemblyMode) -> Self {
        Self {
            mode,
            records: Vec::new(),
            dropped_rows: 0,
            unmapped_labels: BTreeSet::new(),
            glycol_relocations: 0,
        }
    }
}

pub(crate) struct RowAssembler {
    normalizer: ColumnNormalizer,
    header_layouts: Vec<Vec<String>>,
    schemes: Vec<PositionalScheme>,
    index_cell: Regex,
    misplaced_glycol: Regex,
}

impl RowAssembler {
    pub(crate) fn new(normalizer: ColumnNormalizer, vocabulary: &Vocabulary) -> Result<Self> {
        let header_layouts = vocabulary
            .header_layouts
            .iter()
            .filter(|layout| !layout.is_empty())
            .map(|layout| {
                layout
                    .iter()
                    .map(|label| normalizer.normalize(label))
                    .collect::<Vec<String>>()
            })
            .collect();

        Ok(Self {
            normalizer,
            header_layouts,
            schemes: vocabulary.positional_schemes.clone(),
            index_cell: Regex::new(r"^\d+$").context("failed to compile index cell regex")?,
            misplaced_glycol: Regex::new(
                r"(?i)\bglycol\b|\d+(?:\.\d+)?\s*%\s*(?:/\s*-?\d|[a-z])",
            )
            .context("failed to compile glycol heuristic regex")?,
        })
    }

    pub(crate) fn assemble(&self, table: &LocatedTable) -> Assembly {
        let rows = table
            .grid
            .iter()
            .map(|row| {
                row.iter()
                    .map(|cell| collapse_whitespace(cell))
                    .collect::<Vec<String>>()
            })
            .filter(|row| row.iter().any(|cell| !clean_cell(cell).is_empty()))
            .collect::<Vec<Vec<String>>>();

        let mut assembly = match table.layout {
            GridLayout::Labeled => self.assemble_labeled(&rows),
            GridLayout::Tabular | GridLayout::Headerless => {
                let has_header = table.layout == GridLayout::Tabular;
                match self.exact_layout(&rows) {
                    Some(layout) => self.assemble_exact(&rows, layout, has_header),
                    None => self.assemble_positional(&rows),
                }
            }
        };

        for record in &mut assembly.records {
            if let Some(source_key) = self.relocate_glycol(record) {
                info!(
                    system = %record.system_name,
                    field = %source_key,
                    "moved glycol-looking value into glycol"
                );
                assembly.glycol_relocations += 1;
            }
        }

        assembly
    }

    /// A configured layout whose width matches every row, if any.
    pub(crate) fn exact_layout(&self, rows: &[Vec<String>]) -> Option<&[String]> {
        if rows.is_empty() {
            return None;
        }
        self.header_layouts
            .iter()
            .find(|layout| rows.iter().all(|row| row.len() == layout.len()))
            .map(Vec::as_slice)
    }

    fn assemble_exact(
        &self,
        rows: &[Vec<String>],
        layout: &[String],
        has_header: bool,
    ) -> Assembly {
        let mut assembly = Assembly::new(AssemblyMode::ExactHeader);
        let data_rows = if has_header { &rows[1..] } else { rows };

        for row in data_rows {
            let first = clean_cell(row.first().map(String::as_str).unwrap_or_default());
            if first.is_empty() || first == "-" {
                debug!(first_cell = %first, "skipping separator row");
                assembly.dropped_rows += 1;
                continue;
            }

            let mut record = SystemRecord::default();
            for (key, cell) in layout.iter().zip(row) {
                self.assign_field(&mut record, key, cell, &mut assembly.unmapped_labels);
            }
            self.accept(record, &mut assembly);
        }

        assembly
    }

    fn assemble_positional(&self, rows: &[Vec<String>]) -> Assembly {
        let mut assembly = Assembly::new(AssemblyMode::Positional);

        for row in rows {
            let first = row.first().map(String::as_str).unwrap_or_default();
            if !self.index_cell.is_match(first) {
                if first == "-" {
                    debug!("skipping dash row");
                    assembly.dropped_rows += 1;
                }
                continue;
            }

            let system_type = clean_cell(row.get(1).map(String::as_str).unwrap_or_default());
            let system_name = clean_cell(row.get(2).map(String::as_str).unwrap_or_default());
            // A "." placeholder still occupies its slot.
            let values = row
                .iter()
                .skip(3)
                .filter(|cell| !cell.is_empty())
                .cloned()
                .collect::<Vec<String>>();

            let Some(scheme) = self
                .schemes
                .iter()
                .find(|scheme| system_type.contains(&scheme.type_contains))
            else {
                debug!(
                    system_type = %system_type,
                    system = %system_name,
                    "no positional scheme for system type; dropping row"
                );
                assembly.dropped_rows += 1;
                continue;
            };

            let mut record = SystemRecord {
                system_type,
                system_name,
                ..SystemRecord::default()
            };

            if values.len() >= scheme.min_values() {
                let count = values.len();
                let middle_end = count - scheme.trailing.len();
                let slots = scheme
                    .leading
                    .iter()
                    .zip(&values)
                    .chain(
                        scheme
                            .middle
                            .iter()
                            .zip(&values[scheme.leading.len()..middle_end]),
                    )
                    .chain(scheme.trailing.iter().zip(&values[middle_end..]));
                for (key, value) in slots {
                    let value = clean_cell(value);
                    if !value.is_empty() {
                        record.values.insert(key.clone(), value);
                    }
                }
            } else {
                debug!(
                    system = %record.system_name,
                    values = values.len(),
                    required = scheme.min_values(),
                    "too few values for positional scheme; keeping system without readings"
                );
            }

            self.accept(record, &mut assembly);
        }

        assembly
    }

    fn assemble_labeled(&self, rows: &[Vec<String>]) -> Assembly {
        let mut assembly = Assembly::new(AssemblyMode::Labeled);
        let Some((header, data_rows)) = rows.split_first() else {
            return assembly;
        };

        let mut keys = header
            .iter()
            .map(|label| self.normalizer.normalize(label))
            .collect::<Vec<String>>();
        let name_column = keys
            .iter()
            .position(|key| key == SYSTEM_NAME_KEY)
            .unwrap_or(0);
        if let Some(key) = keys.get_mut(name_column) {
            *key = SYSTEM_NAME_KEY.to_string();
        }

        for row in data_rows {
            let name = clean_cell(row.get(name_column).map(String::as_str).unwrap_or_default());
            if name.is_empty() || name == "-" {
                debug!("skipping labeled row without a system name");
                assembly.dropped_rows += 1;
                continue;
            }

            let mut record = SystemRecord::default();
            for (key, cell) in keys.iter().zip(row) {
                if key.is_empty() {
                    continue;
                }
                self.assign_field(&mut record, key, cell, &mut assembly.unmapped_labels);
            }
            self.accept(record, &mut assembly);
        }

        assembly
    }

    fn assign_field(
        &self,
        record: &mut SystemRecord,
        key: &str,
        cell: &str,
        unmapped: &mut BTreeSet<String>,
    ) {
        let cell = clean_cell(cell);
        match key {
            INDEX_KEY => {}
            SYSTEM_TYPE_KEY => record.system_type = cell,
            SYSTEM_NAME_KEY => record.system_name = cell,
            COMMENT_KEY => record.comment = cell,
            _ => {
                if cell.is_empty() {
                    return;
                }
                if !self.normalizer.is_metric_key(key)
                    && !self.normalizer.is_field_key(key)
                    && unmapped.insert(key.to_string())
                {
                    info!(label = %key, "unmapped column label stored under its cleaned key");
                }
                record.values.insert(key.to_string(), cell);
            }
        }
    }

    fn accept(&self, record: SystemRecord, assembly: &mut Assembly) {
        if record.system_type.is_empty() && record.system_name.is_empty() {
            debug!("discarding row without system type or name");
            assembly.dropped_rows += 1;
            return;
        }
        assembly.records.push(record);
    }

    /// Moves the first glycol-looking value from another field into an empty
    /// glycol slot. Returns the field it came from.
    fn relocate_glycol(&self, record: &mut SystemRecord) -> Option<String> {
        if record
            .values
            .get(GLYCOL_KEY)
            .is_some_and(|value| !value.is_empty())
        {
            return None;
        }

        let source_key = record
            .values
            .iter()
            .find(|(key, value)| {
                key.as_str() != GLYCOL_KEY && self.misplaced_glycol.is_match(value)
            })
            .map(|(key, _)| key.clone())?;

        let value = record.values.remove(&source_key)?;
        record.values.insert(GLYCOL_KEY.to_string(), value);
        Some(source_key)
    }
}
