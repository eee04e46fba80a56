use anyhow::{Context, Result};
use rusqlite::{Connection, OpenFlags};
use serde::Serialize;
use tracing::{info, warn};

use crate::cli::StatusArgs;
use crate::commands::ingest::count_rows;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct StoreStatus {
    pub documents: i64,
    pub documents_complete: i64,
    pub documents_pending: i64,
    pub systems: i64,
    pub metric_readings: i64,
    pub typed_readings: i64,
    pub facilities: i64,
    pub technicians: i64,
}

pub fn run(args: StatusArgs) -> Result<()> {
    info!(db_path = %args.db_path.display(), "status requested");

    if !args.db_path.exists() {
        warn!(path = %args.db_path.display(), "database file missing");
        return Ok(());
    }

    let connection = Connection::open_with_flags(
        &args.db_path,
        OpenFlags::SQLITE_OPEN_READ_ONLY | OpenFlags::SQLITE_OPEN_NO_MUTEX,
    )
    .with_context(|| format!("failed to open database read-only: {}", args.db_path.display()))?;

    let status = store_status(&connection)?;
    info!(
        path = %args.db_path.display(),
        documents = status.documents,
        complete = status.documents_complete,
        pending = status.documents_pending,
        systems = status.systems,
        metric_readings = status.metric_readings,
        typed_readings = status.typed_readings,
        facilities = status.facilities,
        technicians = status.technicians,
        "database status"
    );
    if status.documents_pending > 0 {
        warn!(
            pending = status.documents_pending,
            "some documents are pending; rerun ingest to resume them"
        );
    }

    Ok(())
}

pub fn store_status(connection: &Connection) -> Result<StoreStatus> {
    let documents_complete = count_rows(
        connection,
        "SELECT COUNT(*) FROM documents WHERE status = 'complete'",
    )
    .context("failed to count documents")?;
    let documents = count_rows(connection, "SELECT COUNT(*) FROM documents")?;

    Ok(StoreStatus {
        documents,
        documents_complete,
        documents_pending: documents - documents_complete,
        systems: count_rows(connection, "SELECT COUNT(*) FROM systems")?,
        metric_readings: count_rows(connection, "SELECT COUNT(*) FROM metrics")?,
        typed_readings: count_rows(connection, "SELECT COUNT(*) FROM readings")?,
        facilities: count_rows(
            connection,
            "SELECT COUNT(DISTINCT facility) FROM documents",
        )?,
        technicians: count_rows(
            connection,
            "SELECT COUNT(DISTINCT technician) FROM documents",
        )?,
    })
}
