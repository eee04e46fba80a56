use super::*;

pub fn run(args: IngestArgs, config: &ParserConfig, config_path: Option<&Path>) -> Result<()> {
    let started_ts = Utc::now();
    let started_at = now_utc_string();
    let run_id = format!("run-{}", utc_compact_string(started_ts));

    let manifest_dir = args.manifest_dir.clone().unwrap_or_else(|| {
        args.db_path
            .parent()
            .map(Path::to_path_buf)
            .unwrap_or_default()
            .join("manifests")
    });
    ensure_directory(&manifest_dir)?;

    let ingest_manifest_path =
        manifest_dir.join(format!("ingest_run_{}.json", utc_compact_string(started_ts)));
    let run_log_path =
        manifest_dir.join(format!("ingest_run_{}.log", utc_compact_string(started_ts)));

    info!(
        input_dir = %args.input_dir.display(),
        db_path = %args.db_path.display(),
        run_id = %run_id,
        "starting ingest"
    );

    let tool_versions = collect_tool_versions();
    if tool_versions.pdftotext.is_none() {
        warn!("pdftotext not found; PDF reports will fail to extract");
    }

    let mut connection = Connection::open(&args.db_path)
        .with_context(|| format!("failed to open {}", args.db_path.display()))?;
    configure_connection(&connection)?;
    ensure_schema(&connection)?;

    let orchestrator = Orchestrator::new(
        config,
        PdfReadOptions {
            ocr_mode: args.ocr_mode,
            ocr_lang: args.ocr_lang.clone(),
            ocr_min_text_chars: args.ocr_min_text_chars,
        },
    )?;

    let (mut counts, documents) =
        orchestrator.ingest_directory(&mut connection, &args.input_dir, args.recursive)?;

    counts.documents_total = count_rows(&connection, "SELECT COUNT(*) FROM documents")?;
    counts.systems_total = count_rows(&connection, "SELECT COUNT(*) FROM systems")?;
    counts.metrics_total = count_rows(&connection, "SELECT COUNT(*) FROM metrics")?;
    let updated_at = now_utc_string();

    let warnings = documents
        .iter()
        .flat_map(|document| {
            document
                .warnings
                .iter()
                .map(move |warning| format!("{}: {warning}", document.filename))
        })
        .collect::<Vec<String>>();

    let status = if counts.failed_count > 0 || counts.systems_failed > 0 {
        "completed_with_failures"
    } else {
        "completed"
    };

    let manifest = IngestRunManifest {
        manifest_version: 1,
        run_id: run_id.clone(),
        db_schema_version: DB_SCHEMA_VERSION.to_string(),
        status: status.to_string(),
        started_at,
        updated_at,
        command: render_ingest_command(&args, config_path),
        tool_versions,
        paths: IngestPaths {
            input_dir: args.input_dir.display().to_string(),
            manifest_dir: manifest_dir.display().to_string(),
            db_path: args.db_path.display().to_string(),
            run_log_path: run_log_path.display().to_string(),
            config_path: config_path.map(|path| path.display().to_string()),
        },
        counts,
        documents,
        warnings,
    };

    write_json_pretty(&ingest_manifest_path, &manifest)?;
    write_lines(&run_log_path, &render_run_log(&manifest))?;

    info!(path = %ingest_manifest_path.display(), "wrote ingest run manifest");
    info!(path = %run_log_path.display(), "wrote ingest run log");
    info!(
        processed = manifest.counts.processed_count,
        skipped = manifest.counts.skipped_complete_count + manifest.counts.skipped_unsupported_count,
        failed = manifest.counts.failed_count,
        systems_inserted = manifest.counts.systems_inserted,
        documents_total = manifest.counts.documents_total,
        systems_total = manifest.counts.systems_total,
        "ingest completed"
    );

    Ok(())
}

/// Plain-text companion to the JSON manifest, one block per document.
pub(crate) fn render_run_log(manifest: &IngestRunManifest) -> Vec<String> {
    let mut lines = vec![
        format!("ingest run {} ({})", manifest.run_id, manifest.status),
        format!("started_at: {}", manifest.started_at),
        format!("finished_at: {}", manifest.updated_at),
        format!("input_dir: {}", manifest.paths.input_dir),
        format!("db_path: {}", manifest.paths.db_path),
        String::new(),
    ];

    for document in &manifest.documents {
        lines.push(format!(
            "[{}] {}: {} inserted, {} duplicate, {} failed, {} rows dropped",
            document.status.as_str(),
            document.filename,
            document.systems_inserted,
            document.systems_duplicate,
            document.systems_failed,
            document.rows_dropped
        ));
        for page in &document.pages {
            match &page.strategy {
                Some(strategy) => lines.push(format!(
                    "  page {}: {strategy} ({} systems)",
                    page.page, page.systems
                )),
                None => lines.push(format!("  page {}: no table located", page.page)),
            }
        }
        if !document.missing_fields.is_empty() {
            lines.push(format!("  missing fields: {}", document.missing_fields.join(", ")));
        }
        if document.technician_placeholder {
            lines.push("  technician: configured placeholder".to_string());
        }
        if !document.unmapped_labels.is_empty() {
            lines.push(format!(
                "  unmapped labels: {}",
                document.unmapped_labels.join(", ")
            ));
        }
        if document.glycol_relocations > 0 {
            lines.push(format!(
                "  glycol relocations: {}",
                document.glycol_relocations
            ));
        }
        for warning in &document.warnings {
            lines.push(format!("  warning: {warning}"));
        }
        if let Some(error) = &document.error {
            lines.push(format!("  error: {error}"));
        }
    }

    let counts = &manifest.counts;
    lines.push(String::new());
    lines.push(format!(
        "files: {} | processed: {} | resumed: {} | skipped complete: {} | skipped unsupported: {} | failed: {}",
        counts.file_count,
        counts.processed_count,
        counts.resumed_count,
        counts.skipped_complete_count,
        counts.skipped_unsupported_count,
        counts.failed_count
    ));
    lines.push(format!(
        "systems inserted: {} | duplicate: {} | failed: {} | rows dropped: {} | pages without table: {}",
        counts.systems_inserted,
        counts.systems_duplicate,
        counts.systems_failed,
        counts.rows_dropped,
        counts.pages_without_table
    ));
    lines.push(format!(
        "store totals: {} documents, {} systems, {} metric readings",
        counts.documents_total, counts.systems_total, counts.metrics_total
    ));

    lines
}

fn collect_tool_versions() -> ToolVersions {
    ToolVersions {
        pdftotext: command_version_optional("pdftotext", &["-v"]),
        pdftoppm: command_version_optional("pdftoppm", &["-v"]),
        tesseract: command_version_optional("tesseract", &["--version"]),
    }
}

fn command_version_optional(program: &str, args: &[&str]) -> Option<String> {
    let output = Command::new(program).args(args).output().ok()?;

    let stdout = String::from_utf8_lossy(&output.stdout);
    let stderr = String::from_utf8_lossy(&output.stderr);
    let source = if stdout.trim().is_empty() {
        stderr.trim()
    } else {
        stdout.trim()
    };

    source
        .lines()
        .next()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .map(|line| line.to_string())
}

pub(crate) fn render_ingest_command(args: &IngestArgs, config_path: Option<&Path>) -> String {
    let mut command = vec!["fieldreport".to_string()];
    if let Some(path) = config_path {
        command.push("--config".to_string());
        command.push(path.display().to_string());
    }
    command.extend([
        "ingest".to_string(),
        "--input-dir".to_string(),
        args.input_dir.display().to_string(),
        "--db-path".to_string(),
        args.db_path.display().to_string(),
    ]);

    if let Some(path) = &args.manifest_dir {
        command.push("--manifest-dir".to_string());
        command.push(path.display().to_string());
    }
    if args.recursive {
        command.push("--recursive".to_string());
    }
    if args.ocr_mode != OcrMode::Off {
        command.push("--ocr-mode".to_string());
        command.push(args.ocr_mode.as_str().to_string());
        command.push("--ocr-lang".to_string());
        command.push(args.ocr_lang.clone());
        command.push("--ocr-min-text-chars".to_string());
        command.push(args.ocr_min_text_chars.to_string());
    }

    command.join(" ")
}
