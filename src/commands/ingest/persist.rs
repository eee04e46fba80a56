use super::*;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum DocumentState {
    New,
    /// Inserted by an earlier run that did not finish writing its systems.
    Pending(i64),
    Complete(i64),
}

pub(crate) fn document_state(connection: &Connection, filename: &str) -> Result<DocumentState> {
    let existing = connection
        .query_row(
            "SELECT id, status FROM documents WHERE filename = ?1",
            [filename],
            |row| Ok((row.get::<_, i64>(0)?, row.get::<_, String>(1)?)),
        )
        .optional()
        .with_context(|| format!("failed to look up document {filename}"))?;

    Ok(match existing {
        None => DocumentState::New,
        Some((id, status)) if status == DOCUMENT_STATUS_COMPLETE => DocumentState::Complete(id),
        Some((id, _)) => DocumentState::Pending(id),
    })
}

pub(crate) const DOCUMENT_STATUS_PENDING: &str = "pending";
pub(crate) const DOCUMENT_STATUS_COMPLETE: &str = "complete";

pub(crate) struct NewDocument<'a> {
    pub(crate) filename: &'a str,
    pub(crate) sha256: Option<&'a str>,
    pub(crate) source_kind: &'a str,
    pub(crate) header: &'a HeaderFields,
}

pub(crate) fn insert_document(connection: &Connection, document: &NewDocument<'_>) -> Result<i64> {
    let header = document.header;
    connection
        .execute(
            "
            INSERT INTO documents(
              filename, sha256, source_kind, facility, report_date, date_raw,
              technician, technician_is_placeholder, status, ingested_at
            )
            VALUES(?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)
            ",
            params![
                document.filename,
                document.sha256,
                document.source_kind,
                header.facility,
                header.report_date.map(|date| date.format("%Y-%m-%d").to_string()),
                header.date_raw,
                header.technician,
                header.technician_is_placeholder,
                DOCUMENT_STATUS_PENDING,
                now_utc_string(),
            ],
        )
        .with_context(|| format!("failed to insert document {}", document.filename))?;
    Ok(connection.last_insert_rowid())
}

pub(crate) fn mark_document_complete(connection: &Connection, document_id: i64) -> Result<()> {
    connection
        .execute(
            "UPDATE documents SET status = ?1 WHERE id = ?2",
            params![DOCUMENT_STATUS_COMPLETE, document_id],
        )
        .with_context(|| format!("failed to mark document {document_id} complete"))?;
    Ok(())
}

/// Header fields as stored, used when resuming a pending document so its
/// remaining systems carry the same facility/date/technician.
pub(crate) fn stored_header(connection: &Connection, document_id: i64) -> Result<HeaderFields> {
    connection
        .query_row(
            "
            SELECT facility, report_date, date_raw, technician, technician_is_placeholder
            FROM documents WHERE id = ?1
            ",
            [document_id],
            |row| {
                let report_date: Option<String> = row.get(1)?;
                Ok(HeaderFields {
                    facility: row.get(0)?,
                    report_date: report_date
                        .and_then(|value| NaiveDate::parse_from_str(&value, "%Y-%m-%d").ok()),
                    date_raw: row.get(2)?,
                    technician: row.get(3)?,
                    technician_is_placeholder: row.get(4)?,
                })
            },
        )
        .with_context(|| format!("failed to read header fields of document {document_id}"))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum SystemInsert {
    Inserted(i64),
    Duplicate,
}

pub(crate) struct SystemContext<'a> {
    pub(crate) document_id: i64,
    pub(crate) header: &'a HeaderFields,
    pub(crate) strategy: &'a str,
    pub(crate) page: usize,
}

/// Writes one system, its raw metric strings and its typed readings row in
/// a single transaction. An existing (document, system name) pair is a
/// duplicate and leaves the store untouched.
pub(crate) fn insert_system(
    connection: &mut Connection,
    context: &SystemContext<'_>,
    record: &SystemRecord,
) -> Result<SystemInsert> {
    let tx = connection.transaction()?;

    let changes = tx
        .execute(
            "
            INSERT INTO systems(document_id, system_type, system_name, comment, strategy, page)
            VALUES(?1, ?2, ?3, ?4, ?5, ?6)
            ON CONFLICT(document_id, system_name) DO NOTHING
            ",
            params![
                context.document_id,
                record.system_type,
                record.system_name,
                (!record.comment.is_empty()).then_some(record.comment.as_str()),
                context.strategy,
                context.page as i64,
            ],
        )
        .with_context(|| format!("failed to insert system {}", record.system_name))?;
    if changes == 0 {
        return Ok(SystemInsert::Duplicate);
    }
    let system_id = tx.last_insert_rowid();

    {
        let mut statement = tx.prepare(
            "
            INSERT INTO metrics(system_id, metric_key, metric_value)
            VALUES(?1, ?2, ?3)
            ON CONFLICT(system_id, metric_key) DO NOTHING
            ",
        )?;
        for (key, value) in &record.values {
            statement
                .execute(params![system_id, key, value])
                .with_context(|| format!("failed to insert metric {key} for system {system_id}"))?;
        }
    }

    insert_typed_reading(&tx, system_id, context, record)?;

    tx.commit()
        .with_context(|| format!("failed to commit system {}", record.system_name))?;
    Ok(SystemInsert::Inserted(system_id))
}

fn insert_typed_reading(
    connection: &Connection,
    system_id: i64,
    context: &SystemContext<'_>,
    record: &SystemRecord,
) -> Result<()> {
    let mut typed: BTreeMap<String, Option<f64>> = BTreeMap::new();
    for (key, value) in &record.values {
        let Some(column) = metric_column_name(key) else {
            continue;
        };
        if READINGS_FIXED_COLUMNS.contains(&column.as_str()) {
            continue;
        }
        typed
            .entry(column)
            .or_insert_with(|| coerce_numeric(Some(value)));
    }

    for column in typed.keys() {
        if ensure_column_exists(connection, "readings", &format!("\"{column}\" REAL"))? {
            info!(column = %column, "added typed metric column");
        }
    }

    let header = context.header;
    let mut columns = READINGS_FIXED_COLUMNS
        .iter()
        .map(|column| column.to_string())
        .collect::<Vec<String>>();
    let mut values = vec![
        Value::Integer(system_id),
        optional_text(header.facility.as_deref()),
        optional_text(
            header
                .report_date
                .map(|date| date.format("%Y-%m-%d").to_string())
                .as_deref(),
        ),
        optional_text(header.technician.as_deref()),
        Value::Text(record.system_type.clone()),
        Value::Text(record.system_name.clone()),
    ];
    for (column, value) in typed {
        columns.push(format!("\"{column}\""));
        values.push(value.map_or(Value::Null, Value::Real));
    }

    let placeholders = (1..=values.len())
        .map(|index| format!("?{index}"))
        .collect::<Vec<String>>()
        .join(", ");
    let sql = format!(
        "INSERT OR REPLACE INTO readings({}) VALUES({placeholders})",
        columns.join(", ")
    );
    connection
        .execute(&sql, params_from_iter(values))
        .with_context(|| format!("failed to insert typed reading for system {system_id}"))?;
    Ok(())
}

fn optional_text(value: Option<&str>) -> Value {
    match value {
        Some(text) => Value::Text(text.to_string()),
        None => Value::Null,
    }
}
