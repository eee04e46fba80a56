use super::*;

/// Systems assembled from the table located on one page.
#[derive(Debug, Clone)]
pub(crate) struct PageTables {
    pub(crate) page: usize,
    pub(crate) strategy: StrategyKind,
    pub(crate) mode: AssemblyMode,
    pub(crate) records: Vec<SystemRecord>,
    pub(crate) dropped_rows: usize,
    pub(crate) unmapped_labels: BTreeSet<String>,
    pub(crate) glycol_relocations: usize,
}

#[derive(Debug, Clone)]
pub(crate) struct ParsedReport {
    pub(crate) header: HeaderFields,
    pub(crate) pages: Vec<PageTables>,
    pub(crate) pages_without_table: Vec<usize>,
    pub(crate) ocr_pages: usize,
}

impl ParsedReport {
    pub(crate) fn system_count(&self) -> usize {
        self.pages.iter().map(|page| page.records.len()).sum()
    }
}

/// Everything needed to turn one report file into stored systems. Built once
/// per run from the parser configuration.
pub(crate) struct Orchestrator {
    skip_cover_page_tables: bool,
    pdf_options: PdfReadOptions,
    locator: TableLocator,
    assembler: RowAssembler,
    header_fields: HeaderFieldExtractor,
}

impl Orchestrator {
    pub(crate) fn new(config: &ParserConfig, pdf_options: PdfReadOptions) -> Result<Self> {
        let normalizer = ColumnNormalizer::new(&config.vocabulary)?;
        let locator = TableLocator::new(config, &normalizer)?;
        let assembler = RowAssembler::new(normalizer, &config.vocabulary)?;
        let header_fields = HeaderFieldExtractor::new(&config.header_fields)?;

        Ok(Self {
            skip_cover_page_tables: config.skip_cover_page_tables,
            pdf_options,
            locator,
            assembler,
            header_fields,
        })
    }

    pub(crate) fn read_document(&self, path: &Path, format: ReportFormat) -> Result<ExtractedDocument> {
        match format {
            ReportFormat::Docx => read_docx(path),
            ReportFormat::Pdf => read_pdf(path, &self.pdf_options),
        }
    }

    /// Header fields from the first page, then one located table per
    /// remaining page.
    pub(crate) fn parse_document(&self, document: &ExtractedDocument, filename: &str) -> ParsedReport {
        let full_text = document.full_text();
        let header = self
            .header_fields
            .extract(document.header_text(), &full_text, filename);

        let skip_cover = self.skip_cover_page_tables && document.sections.len() > 1;
        let mut pages = Vec::new();
        let mut pages_without_table = Vec::new();

        for section in document.sections.iter().skip(usize::from(skip_cover)) {
            let Some(table) = self.locator.locate(section) else {
                info!(
                    filename = %filename,
                    page = section.number,
                    source = section.source.as_str(),
                    "no table located on page"
                );
                pages_without_table.push(section.number);
                continue;
            };

            let assembly = self.assembler.assemble(&table);
            if assembly.records.is_empty() {
                debug!(
                    filename = %filename,
                    page = section.number,
                    strategy = table.strategy.as_str(),
                    rows = table.grid.len(),
                    "located table produced no systems"
                );
            }
            info!(
                filename = %filename,
                page = section.number,
                strategy = table.strategy.as_str(),
                mode = assembly.mode.as_str(),
                systems = assembly.records.len(),
                dropped_rows = assembly.dropped_rows,
                "table located"
            );

            pages.push(PageTables {
                page: section.number,
                strategy: table.strategy,
                mode: assembly.mode,
                records: assembly.records,
                dropped_rows: assembly.dropped_rows,
                unmapped_labels: assembly.unmapped_labels,
                glycol_relocations: assembly.glycol_relocations,
            });
        }

        ParsedReport {
            header,
            pages,
            pages_without_table,
            ocr_pages: document.ocr_pages,
        }
    }

    /// Ingests one report. Errors cover unreadable files and store failures
    /// outside a single system; per-system failures are counted in the entry.
    pub(crate) fn ingest_file(&self, connection: &mut Connection, path: &Path) -> Result<DocumentRunEntry> {
        let filename = report_filename(path)?;
        let size_bytes = fs::metadata(path)
            .with_context(|| format!("failed to stat {}", path.display()))?
            .len();

        let kind = classify_report(path, size_bytes);
        let format = report_format(path).filter(|_| kind.is_ingestible());
        let Some(format) = format else {
            warn!(filename = %filename, kind = kind.as_str(), "skipping unsupported or empty file");
            let mut entry = DocumentRunEntry::new(&filename, DocumentStatus::SkippedUnsupported);
            entry.warnings.push(format!("skipped {} file", kind.as_str()));
            return Ok(entry);
        };

        let existing = match document_state(connection, &filename)? {
            DocumentState::Complete(_) => {
                info!(filename = %filename, "document already ingested; skipping");
                return Ok(DocumentRunEntry::new(&filename, DocumentStatus::SkippedComplete));
            }
            DocumentState::Pending(document_id) => Some(document_id),
            DocumentState::New => None,
        };

        let mut entry = DocumentRunEntry::new(&filename, DocumentStatus::Ingested);
        if kind == ReportKind::PdfScanned && self.pdf_options.ocr_mode == OcrMode::Off {
            warn!(filename = %filename, "scanned PDF without OCR; tables are unlikely to be found");
            entry
                .warnings
                .push("scanned PDF ingested without OCR".to_string());
        }

        let sha256 = sha256_file(path)?;
        let document = self.read_document(path, format)?;
        let parsed = self.parse_document(&document, &filename);

        let (document_id, header) = match existing {
            Some(document_id) => {
                info!(filename = %filename, document_id, "resuming partially ingested document");
                entry.status = DocumentStatus::Resumed;
                (document_id, stored_header(connection, document_id)?)
            }
            None => {
                let document_id = insert_document(
                    connection,
                    &NewDocument {
                        filename: &filename,
                        sha256: Some(&sha256),
                        source_kind: kind.as_str(),
                        header: &parsed.header,
                    },
                )?;
                (document_id, parsed.header.clone())
            }
        };

        entry.missing_fields = header.missing_fields();
        entry.technician_placeholder = header.technician_is_placeholder;
        entry.ocr_pages = parsed.ocr_pages;
        if !entry.missing_fields.is_empty() {
            warn!(
                filename = %filename,
                missing = %entry.missing_fields.join(","),
                "header fields not extracted"
            );
        }
        if header.technician_is_placeholder {
            info!(
                filename = %filename,
                technician = header.technician.as_deref().unwrap_or_default(),
                "technician not found; recorded configured placeholder"
            );
        }

        for page in &parsed.pages {
            let context = SystemContext {
                document_id,
                header: &header,
                strategy: page.strategy.as_str(),
                page: page.page,
            };

            for record in &page.records {
                match insert_system(connection, &context, record) {
                    Ok(SystemInsert::Inserted(_)) => entry.systems_inserted += 1,
                    Ok(SystemInsert::Duplicate) => {
                        info!(
                            filename = %filename,
                            system = %record.system_name,
                            "system already stored; skipping duplicate"
                        );
                        entry.systems_duplicate += 1;
                    }
                    Err(error) => {
                        warn!(
                            filename = %filename,
                            system = %record.system_name,
                            error = %format!("{error:#}"),
                            "failed to store system; continuing"
                        );
                        entry.systems_failed += 1;
                        entry
                            .warnings
                            .push(format!("system {}: {error:#}", record.system_name));
                    }
                }
            }

            entry.rows_dropped += page.dropped_rows;
            entry.glycol_relocations += page.glycol_relocations;
            entry.unmapped_labels.extend(page.unmapped_labels.iter().cloned());
            entry.pages.push(PageRunEntry {
                page: page.page,
                strategy: Some(page.strategy.as_str().to_string()),
                systems: page.records.len(),
            });
        }
        for page in &parsed.pages_without_table {
            entry.pages.push(PageRunEntry {
                page: *page,
                strategy: None,
                systems: 0,
            });
        }
        entry.pages.sort_by_key(|page| page.page);
        entry.unmapped_labels.sort();
        entry.unmapped_labels.dedup();

        if entry.systems_failed == 0 {
            mark_document_complete(connection, document_id)?;
        } else {
            warn!(
                filename = %filename,
                failed = entry.systems_failed,
                "document left pending; failed systems will be retried on the next run"
            );
        }

        info!(
            filename = %filename,
            status = entry.status.as_str(),
            systems = parsed.system_count(),
            inserted = entry.systems_inserted,
            duplicate = entry.systems_duplicate,
            failed = entry.systems_failed,
            "document processed"
        );

        Ok(entry)
    }

    /// Ingests every file under `input_dir`. A document that fails is logged
    /// and recorded; the run continues with the next one.
    pub(crate) fn ingest_directory(
        &self,
        connection: &mut Connection,
        input_dir: &Path,
        recursive: bool,
    ) -> Result<(IngestCounts, Vec<DocumentRunEntry>)> {
        let paths = discover_report_files(input_dir, recursive)?;
        let mut counts = IngestCounts {
            file_count: paths.len(),
            ..IngestCounts::default()
        };
        let mut documents = Vec::with_capacity(paths.len());

        for path in &paths {
            let entry = match self.ingest_file(connection, path) {
                Ok(entry) => entry,
                Err(error) => {
                    let filename = path
                        .file_name()
                        .map(|name| name.to_string_lossy().into_owned())
                        .unwrap_or_else(|| path.display().to_string());
                    warn!(
                        filename = %filename,
                        error = %format!("{error:#}"),
                        "failed to ingest document; continuing"
                    );
                    let mut entry = DocumentRunEntry::new(&filename, DocumentStatus::Failed);
                    entry.error = Some(format!("{error:#}"));
                    entry
                }
            };

            tally_document(&mut counts, &entry);
            documents.push(entry);
        }

        Ok((counts, documents))
    }
}

fn tally_document(counts: &mut IngestCounts, entry: &DocumentRunEntry) {
    match entry.status {
        DocumentStatus::Ingested => {
            counts.processed_count += 1;
            counts.documents_inserted += 1;
        }
        DocumentStatus::Resumed => {
            counts.processed_count += 1;
            counts.resumed_count += 1;
        }
        DocumentStatus::SkippedComplete => counts.skipped_complete_count += 1,
        DocumentStatus::SkippedUnsupported => counts.skipped_unsupported_count += 1,
        DocumentStatus::Failed => counts.failed_count += 1,
    }

    counts.systems_inserted += entry.systems_inserted;
    counts.systems_duplicate += entry.systems_duplicate;
    counts.systems_failed += entry.systems_failed;
    counts.rows_dropped += entry.rows_dropped;
    counts.unmapped_labels += entry.unmapped_labels.len();
    counts.glycol_relocations += entry.glycol_relocations;
    counts.ocr_page_count += entry.ocr_pages;
    counts.pages_without_table += entry
        .pages
        .iter()
        .filter(|page| page.strategy.is_none())
        .count();
}
