use anyhow::{Context, Result};
use rusqlite::{Connection, OpenFlags};
use tracing::{debug, info};

use super::output::{
    assessment_lines, overview_lines, series_lines, write_json, write_lines,
};
use super::store::{facilities, metric_columns, overview, series, system_types, systems};
use crate::cli::{QueryArgs, QueryCommand};
use crate::rules::assess_series;

pub fn run(args: QueryArgs) -> Result<()> {
    let connection = Connection::open_with_flags(
        &args.db_path,
        OpenFlags::SQLITE_OPEN_READ_ONLY | OpenFlags::SQLITE_OPEN_NO_MUTEX,
    )
    .with_context(|| format!("failed to open database read-only: {}", args.db_path.display()))?;

    debug!(db_path = %args.db_path.display(), query = ?args.query, "running query");

    match &args.query {
        QueryCommand::Overview => {
            let overview = overview(&connection)?;
            if args.json {
                write_json(&overview)
            } else {
                write_lines(&overview_lines(&overview))
            }
        }
        QueryCommand::Facilities => write_values(args.json, &facilities(&connection)?),
        QueryCommand::SystemTypes { facility } => {
            write_values(args.json, &system_types(&connection, facility)?)
        }
        QueryCommand::Systems {
            facility,
            system_type,
        } => write_values(args.json, &systems(&connection, facility, system_type)?),
        QueryCommand::Metrics => write_values(args.json, &metric_columns(&connection)?),
        QueryCommand::Series(series_args) => {
            let points = series(&connection, series_args)?;
            info!(
                metric = %series_args.metric,
                system = %series_args.system,
                points = points.len(),
                "series loaded"
            );
            if args.json {
                write_json(&points)
            } else {
                write_lines(&series_lines(&series_args.metric, &points))
            }
        }
        QueryCommand::Assess(series_args) => {
            let points = series(&connection, series_args)?;
            let values = points.iter().map(|point| point.value).collect::<Vec<f64>>();
            let assessment = assess_series(series_args.metric.trim(), &values);
            if args.json {
                write_json(&assessment)
            } else {
                write_lines(&assessment_lines(&assessment))
            }
        }
    }
}

fn write_values(json: bool, values: &[String]) -> Result<()> {
    if json {
        write_json(&values)
    } else {
        write_lines(values)
    }
}
