use anyhow::{Context, Result, bail};
use chrono::NaiveDate;
use rusqlite::{Connection, params};
use serde::Serialize;

use crate::cli::SeriesArgs;
use crate::commands::ingest::{READINGS_FIXED_COLUMNS, count_rows, table_columns};

#[derive(Debug, Clone, Serialize)]
pub(super) struct Overview {
    pub(super) readings: i64,
    pub(super) facilities: i64,
    pub(super) technicians: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub(super) struct SeriesPoint {
    pub(super) date: String,
    pub(super) value: f64,
}

pub(super) fn overview(connection: &Connection) -> Result<Overview> {
    Ok(Overview {
        readings: count_rows(connection, "SELECT COUNT(*) FROM readings")?,
        facilities: count_rows(
            connection,
            "SELECT COUNT(DISTINCT facility_name) FROM readings",
        )?,
        technicians: count_rows(connection, "SELECT COUNT(DISTINCT chemist) FROM readings")?,
    })
}

pub(super) fn facilities(connection: &Connection) -> Result<Vec<String>> {
    let mut statement = connection.prepare(
        "
        SELECT DISTINCT facility_name FROM readings
        WHERE facility_name IS NOT NULL
        ORDER BY facility_name
        ",
    )?;
    let rows = statement.query_map([], |row| row.get::<_, String>(0))?;
    rows.collect::<rusqlite::Result<Vec<String>>>()
        .context("failed to list facilities")
}

pub(super) fn system_types(connection: &Connection, facility: &str) -> Result<Vec<String>> {
    let mut statement = connection.prepare(
        "
        SELECT DISTINCT system_type FROM readings
        WHERE facility_name = ?1 AND system_type IS NOT NULL
        ORDER BY system_type
        ",
    )?;
    let rows = statement.query_map([facility], |row| row.get::<_, String>(0))?;
    rows.collect::<rusqlite::Result<Vec<String>>>()
        .with_context(|| format!("failed to list system types for {facility}"))
}

pub(super) fn systems(
    connection: &Connection,
    facility: &str,
    system_type: &str,
) -> Result<Vec<String>> {
    let mut statement = connection.prepare(
        "
        SELECT DISTINCT system_name FROM readings
        WHERE facility_name = ?1 AND system_type = ?2 AND system_name IS NOT NULL
        ORDER BY system_name
        ",
    )?;
    let rows = statement.query_map(params![facility, system_type], |row| {
        row.get::<_, String>(0)
    })?;
    rows.collect::<rusqlite::Result<Vec<String>>>()
        .with_context(|| format!("failed to list systems for {facility} / {system_type}"))
}

/// Typed metric columns of the readings table, in schema order.
pub(super) fn metric_columns(connection: &Connection) -> Result<Vec<String>> {
    Ok(table_columns(connection, "readings")?
        .into_iter()
        .filter(|column| !READINGS_FIXED_COLUMNS.contains(&column.as_str()))
        .collect())
}

/// Date-ordered readings of one metric for one system. Rows without a date
/// or value are left out.
pub(super) fn series(connection: &Connection, args: &SeriesArgs) -> Result<Vec<SeriesPoint>> {
    let metric = args.metric.trim();
    if !metric_columns(connection)?.iter().any(|column| column == metric) {
        bail!("unknown metric column: {metric}");
    }
    let from = parse_bound(args.from.as_deref(), "--from")?;
    let to = parse_bound(args.to.as_deref(), "--to")?;

    let sql = format!(
        "
        SELECT date, \"{metric}\" FROM readings
        WHERE facility_name = ?1 AND system_type = ?2 AND system_name = ?3
          AND date IS NOT NULL AND \"{metric}\" IS NOT NULL
          AND (?4 IS NULL OR date >= ?4)
          AND (?5 IS NULL OR date <= ?5)
        ORDER BY date, system_id
        "
    );
    let mut statement = connection.prepare(&sql)?;
    let rows = statement.query_map(
        params![args.facility, args.system_type, args.system, from, to],
        |row| {
            Ok(SeriesPoint {
                date: row.get(0)?,
                value: row.get(1)?,
            })
        },
    )?;
    rows.collect::<rusqlite::Result<Vec<SeriesPoint>>>()
        .with_context(|| format!("failed to read {metric} series for {}", args.system))
}

fn parse_bound(value: Option<&str>, flag: &str) -> Result<Option<String>> {
    let Some(value) = value.map(str::trim).filter(|value| !value.is_empty()) else {
        return Ok(None);
    };
    let date = NaiveDate::parse_from_str(value, "%Y-%m-%d")
        .with_context(|| format!("{flag} must be YYYY-MM-DD, got {value}"))?;
    Ok(Some(date.format("%Y-%m-%d").to_string()))
}
