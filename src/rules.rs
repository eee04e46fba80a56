use serde::Serialize;

const NOT_ENOUGH_DATA_IMPACT: &str =
    "Not enough data or metric not supported for impact assessment.";
const NOT_ENOUGH_DATA_IMPROVEMENTS: &str =
    "Not enough data or metric not supported for improvement suggestions.";

/// Slopes smaller than this are reported as a stable trend.
const TREND_EPSILON: f64 = 1e-9;

/// Ideal operating range and cost model for one metric.
#[derive(Debug, Clone, Copy)]
pub struct MetricRule {
    pub metric: &'static str,
    pub ideal_min: f64,
    pub ideal_max: f64,
    /// Share of the base cost lost when every reading is out of range.
    pub impact_factor: f64,
    pub base_cost: f64,
    pub high_impact: &'static str,
    pub low_impact: &'static str,
    pub high_suggestion: &'static str,
    pub low_suggestion: &'static str,
}

pub const METRIC_RULES: &[MetricRule] = &[
    MetricRule {
        metric: "ph",
        ideal_min: 7.5,
        ideal_max: 9.0,
        impact_factor: 0.15,
        base_cost: 10_000.0,
        high_impact: "High pH promotes scaling, increasing energy costs by up to 20% and maintenance for cleaning.",
        low_impact: "Low pH causes corrosion, leading to equipment damage and repair costs up to $5,000/year.",
        high_suggestion: "Add acid (e.g., sulfuric) to lower pH; increase blowdown if alkalinity is high.",
        low_suggestion: "Add alkaline (e.g., sodium hydroxide) to raise pH; check for acid leaks.",
    },
    MetricRule {
        metric: "conductivity",
        ideal_min: 0.0,
        ideal_max: 1500.0,
        impact_factor: 0.20,
        base_cost: 10_000.0,
        high_impact: "High conductivity indicates TDS buildup, causing fouling and 10-25% higher energy use.",
        low_impact: "Low conductivity is generally good but may indicate over-blowdown, wasting water (up to 15% higher usage costs).",
        high_suggestion: "Increase blowdown or use reverse osmosis to reduce TDS; monitor cycles of concentration.",
        low_suggestion: "Reduce blowdown to conserve water; ensure makeup water quality.",
    },
    MetricRule {
        metric: "hardness",
        ideal_min: 0.0,
        ideal_max: 100.0,
        impact_factor: 0.25,
        base_cost: 10_000.0,
        high_impact: "High hardness causes scaling, reducing heat transfer efficiency and adding 20-30% to energy bills.",
        low_impact: "Low hardness is ideal, but if too low, it may increase corrosion risk (5-10% higher inhibitor costs).",
        high_suggestion: "Install water softeners or use scale inhibitors (e.g., phosphonates); perform regular descaling.",
        low_suggestion: "Monitor corrosion inhibitors; adjust if pH is low.",
    },
    MetricRule {
        metric: "p_alkalinity",
        ideal_min: 100.0,
        ideal_max: 300.0,
        impact_factor: 0.18,
        base_cost: 10_000.0,
        high_impact: "High P-alkalinity promotes scaling in alkaline conditions, increasing cleaning costs.",
        low_impact: "Low P-alkalinity reduces buffering, leading to pH swings and corrosion (10-20% higher repair costs).",
        high_suggestion: "Acid feed to reduce alkalinity; optimize blowdown.",
        low_suggestion: "Add bicarbonate if needed; stabilize pH control.",
    },
    MetricRule {
        metric: "no2",
        ideal_min: 200.0,
        ideal_max: 600.0,
        impact_factor: 0.12,
        base_cost: 10_000.0,
        high_impact: "High NO2 may indicate over-dosing, wasting chemicals (5-10% higher treatment costs).",
        low_impact: "Low NO2 allows corrosion in closed systems, leading to leaks and downtime costs.",
        high_suggestion: "Reduce inhibitor dosing; monitor for overfeed.",
        low_suggestion: "Increase nitrite-based inhibitor; check for oxygen ingress.",
    },
];

pub fn rule_for(metric: &str) -> Option<&'static MetricRule> {
    METRIC_RULES.iter().find(|rule| rule.metric == metric)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Trend {
    Increasing,
    Decreasing,
    Stable,
}

impl Trend {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Increasing => "increasing",
            Self::Decreasing => "decreasing",
            Self::Stable => "stable",
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct SeriesStats {
    pub points: usize,
    pub mean: f64,
    pub out_of_range_pct: f64,
    pub trend: Trend,
    pub estimated_cost_impact: f64,
}

#[derive(Debug, Clone, Serialize)]
pub struct Assessment {
    pub metric: String,
    pub stats: Option<SeriesStats>,
    pub impact: String,
    pub improvements: String,
}

/// Impact and improvement text for a date-ordered series of readings.
pub fn assess_series(metric: &str, values: &[f64]) -> Assessment {
    let rule = match rule_for(metric) {
        Some(rule) if values.len() >= 2 => rule,
        _ => {
            return Assessment {
                metric: metric.to_string(),
                stats: None,
                impact: NOT_ENOUGH_DATA_IMPACT.to_string(),
                improvements: NOT_ENOUGH_DATA_IMPROVEMENTS.to_string(),
            };
        }
    };

    let mean = values.iter().sum::<f64>() / values.len() as f64;
    let out_of_range = values
        .iter()
        .filter(|value| **value < rule.ideal_min || **value > rule.ideal_max)
        .count();
    let out_of_range_pct = out_of_range as f64 / values.len() as f64 * 100.0;
    let trend = trend_of(values);
    let estimated_cost_impact = out_of_range_pct / 100.0 * rule.impact_factor * rule.base_cost;

    let above_range = mean > rule.ideal_max;
    let impact = format!(
        "The average {metric} is {mean:.2} ({out_of_range_pct:.1}% out of ideal range {}-{}). \
         Trend is {}. Estimated annual budget impact: +${estimated_cost_impact:.0} due to {}",
        rule.ideal_min,
        rule.ideal_max,
        trend.as_str(),
        if above_range {
            rule.high_impact
        } else {
            rule.low_impact
        }
    );
    let improvements = format!(
        "To optimize {metric}: {} Consult a water treatment specialist for site-specific adjustments.",
        if above_range {
            rule.high_suggestion
        } else {
            rule.low_suggestion
        }
    );

    Assessment {
        metric: metric.to_string(),
        stats: Some(SeriesStats {
            points: values.len(),
            mean,
            out_of_range_pct,
            trend,
            estimated_cost_impact,
        }),
        impact,
        improvements,
    }
}

/// Sign of the least-squares slope against the reading index.
fn trend_of(values: &[f64]) -> Trend {
    let count = values.len() as f64;
    let mean_x = (count - 1.0) / 2.0;
    let mean_y = values.iter().sum::<f64>() / count;

    let (covariance, variance) = values.iter().enumerate().fold(
        (0.0, 0.0),
        |(covariance, variance), (index, value)| {
            let dx = index as f64 - mean_x;
            (covariance + dx * (value - mean_y), variance + dx * dx)
        },
    );
    if variance == 0.0 {
        return Trend::Stable;
    }

    let slope = covariance / variance;
    if slope > TREND_EPSILON {
        Trend::Increasing
    } else if slope < -TREND_EPSILON {
        Trend::Decreasing
    } else {
        Trend::Stable
    }
}
