use std::io::{self, Write};

use anyhow::{Context, Result};
use serde::Serialize;

use super::store::{Overview, SeriesPoint};
use crate::rules::Assessment;

pub(super) fn write_json<T: Serialize>(value: &T) -> Result<()> {
    let mut output = io::BufWriter::new(io::stdout().lock());
    serde_json::to_writer_pretty(&mut output, value)
        .context("failed to serialize query json output")?;
    writeln!(output)?;
    output.flush()?;
    Ok(())
}

pub(super) fn write_lines(lines: &[String]) -> Result<()> {
    let mut output = io::BufWriter::new(io::stdout().lock());
    for line in lines {
        writeln!(output, "{line}")?;
    }
    output.flush()?;
    Ok(())
}

pub(super) fn overview_lines(overview: &Overview) -> Vec<String> {
    vec![
        format!("Total readings: {}", overview.readings),
        format!("Facilities: {}", overview.facilities),
        format!("Technicians: {}", overview.technicians),
    ]
}

pub(super) fn series_lines(metric: &str, points: &[SeriesPoint]) -> Vec<String> {
    if points.is_empty() {
        return vec![format!("No {metric} readings for this selection.")];
    }
    points
        .iter()
        .map(|point| format!("{}\t{}", point.date, point.value))
        .collect()
}

pub(super) fn assessment_lines(assessment: &Assessment) -> Vec<String> {
    let mut lines = Vec::new();
    if let Some(stats) = &assessment.stats {
        lines.push(format!(
            "{}: {} points, mean {:.2}, {:.1}% out of range, trend {}",
            assessment.metric,
            stats.points,
            stats.mean,
            stats.out_of_range_pct,
            stats.trend.as_str()
        ));
    }
    lines.push(format!("Impact: {}", assessment.impact));
    lines.push(format!("Improvements: {}", assessment.improvements));
    lines
}
