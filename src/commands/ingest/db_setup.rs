use super::*;

pub(crate) fn configure_connection(connection: &Connection) -> Result<()> {
    connection
        .pragma_update(None, "journal_mode", "WAL")
        .context("failed to set journal_mode=WAL")?;
    connection
        .pragma_update(None, "synchronous", "NORMAL")
        .context("failed to set synchronous=NORMAL")?;
    connection
        .pragma_update(None, "foreign_keys", "ON")
        .context("failed to enable foreign_keys")?;
    Ok(())
}

pub(crate) fn ensure_schema(connection: &Connection) -> Result<()> {
    connection
        .execute_batch(
            "
        CREATE TABLE IF NOT EXISTS metadata (
          key TEXT PRIMARY KEY,
          value TEXT NOT NULL
        );

        CREATE TABLE IF NOT EXISTS documents (
          id INTEGER PRIMARY KEY,
          filename TEXT NOT NULL UNIQUE,
          sha256 TEXT,
          source_kind TEXT NOT NULL,
          facility TEXT,
          report_date TEXT,
          date_raw TEXT,
          technician TEXT,
          technician_is_placeholder INTEGER NOT NULL DEFAULT 0,
          status TEXT NOT NULL DEFAULT 'pending',
          ingested_at TEXT NOT NULL
        );

        CREATE TABLE IF NOT EXISTS systems (
          id INTEGER PRIMARY KEY,
          document_id INTEGER NOT NULL,
          system_type TEXT NOT NULL DEFAULT '',
          system_name TEXT NOT NULL,
          comment TEXT,
          strategy TEXT,
          page INTEGER,
          UNIQUE(document_id, system_name),
          FOREIGN KEY(document_id) REFERENCES documents(id)
        );

        CREATE TABLE IF NOT EXISTS metrics (
          id INTEGER PRIMARY KEY,
          system_id INTEGER NOT NULL,
          metric_key TEXT NOT NULL,
          metric_value TEXT,
          UNIQUE(system_id, metric_key),
          FOREIGN KEY(system_id) REFERENCES systems(id)
        );

        CREATE TABLE IF NOT EXISTS readings (
          system_id INTEGER PRIMARY KEY,
          facility_name TEXT,
          date TEXT,
          chemist TEXT,
          system_type TEXT,
          system_name TEXT,
          FOREIGN KEY(system_id) REFERENCES systems(id)
        );
        ",
        )
        .context("failed to create report schema")?;

    connection.execute_batch(
        "
        CREATE INDEX IF NOT EXISTS idx_systems_document ON systems(document_id);
        CREATE INDEX IF NOT EXISTS idx_metrics_system ON metrics(system_id);
        CREATE INDEX IF NOT EXISTS idx_readings_selector ON readings(facility_name, system_type, system_name);
        ",
    )?;

    let now = now_utc_string();
    connection.execute(
        "INSERT INTO metadata(key, value) VALUES('db_schema_version', ?1)
         ON CONFLICT(key) DO UPDATE SET value=excluded.value",
        [DB_SCHEMA_VERSION],
    )?;
    connection.execute(
        "INSERT INTO metadata(key, value) VALUES('db_updated_at', ?1)
         ON CONFLICT(key) DO UPDATE SET value=excluded.value",
        [now],
    )?;

    Ok(())
}

/// Adds `column_definition` to `table_name` unless a column with that name
/// already exists.
pub(crate) fn ensure_column_exists(
    connection: &Connection,
    table_name: &str,
    column_definition: &str,
) -> Result<bool> {
    let Some(column_name) = column_definition.split_whitespace().next() else {
        bail!("invalid column definition: {column_definition}");
    };
    let column_name = column_name.trim_matches('"');

    if table_columns(connection, table_name)?
        .iter()
        .any(|existing| existing == column_name)
    {
        return Ok(false);
    }

    let alter_sql = format!("ALTER TABLE {table_name} ADD COLUMN {column_definition}");
    connection
        .execute(&alter_sql, [])
        .with_context(|| format!("failed to add column {column_name} on {table_name}"))?;

    Ok(true)
}

pub(crate) fn table_columns(connection: &Connection, table_name: &str) -> Result<Vec<String>> {
    let pragma_sql = format!("PRAGMA table_info({table_name})");
    let mut statement = connection
        .prepare(&pragma_sql)
        .with_context(|| format!("failed to inspect schema for table {table_name}"))?;

    let mut columns = Vec::new();
    let mut rows = statement.query([])?;
    while let Some(row) = rows.next()? {
        let name: String = row.get(1)?;
        columns.push(name);
    }
    Ok(columns)
}

/// Typed-store column name for a metric key: lowercase ASCII letters,
/// digits and underscores, never starting with a digit.
pub(crate) fn metric_column_name(metric_key: &str) -> Option<String> {
    let mut column = metric_key
        .chars()
        .map(|character| {
            if character.is_ascii_alphanumeric() {
                character.to_ascii_lowercase()
            } else {
                '_'
            }
        })
        .collect::<String>();
    while column.contains("__") {
        column = column.replace("__", "_");
    }
    let column = column.trim_matches('_').to_string();
    if column.is_empty() {
        return None;
    }
    if column.starts_with(|character: char| character.is_ascii_digit()) {
        return Some(format!("m_{column}"));
    }
    Some(column)
}

/// Metric keys whose typed columns are reserved by the readings table.
pub(crate) const READINGS_FIXED_COLUMNS: &[&str] = &[
    "system_id",
    "facility_name",
    "date",
    "chemist",
    "system_type",
    "system_name",
];

pub(crate) fn count_rows(connection: &Connection, sql: &str) -> Result<i64> {
    let count = connection.query_row(sql, [], |row| row.get(0))?;
    Ok(count)
}
