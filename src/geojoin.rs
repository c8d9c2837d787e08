// Aligns indicator rows with a boundary dataset for map rendering.
//
// The boundary set drives the join: one output row per polygon, in boundary
// order, whether or not any indicator matched.
use crate::config::LabelFormat;
use crate::error::{BarometerError, Result};
use crate::types::{BoundaryUnit, DailyTrend, DisplayRow, IndicatorRow};
use crate::util::{format_percent, format_rounded};
use log::debug;
use once_cell::sync::Lazy;
use std::collections::{BTreeMap, HashMap};
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Metric {
    SurveyCount,
    CensusCount,
    ClustersCovered,
    ClustersTarget,
    SurveyToCensusRatio,
    ClusterCoveragePct,
}

// Canonical names plus the column names the field team knows them by.
static METRICS: Lazy<HashMap<&'static str, Metric>> = Lazy::new(|| {
    HashMap::from([
        ("survey_count", Metric::SurveyCount),
        ("expra_1", Metric::SurveyCount),
        ("census_count", Metric::CensusCount),
        ("expra_0", Metric::CensusCount),
        ("clusters_covered", Metric::ClustersCovered),
        ("unique_grappe", Metric::ClustersCovered),
        ("clusters_target", Metric::ClustersTarget),
        ("nb_grappes", Metric::ClustersTarget),
        ("survey_to_census_ratio", Metric::SurveyToCensusRatio),
        ("ratio_expra", Metric::SurveyToCensusRatio),
        ("cluster_coverage_pct", Metric::ClusterCoveragePct),
        ("percent_unique_grappe", Metric::ClusterCoveragePct),
    ])
});

impl Metric {
    pub const ALL: [Metric; 6] = [
        Metric::SurveyCount,
        Metric::CensusCount,
        Metric::ClustersCovered,
        Metric::ClustersTarget,
        Metric::SurveyToCensusRatio,
        Metric::ClusterCoveragePct,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            Metric::SurveyCount => "survey_count",
            Metric::CensusCount => "census_count",
            Metric::ClustersCovered => "clusters_covered",
            Metric::ClustersTarget => "clusters_target",
            Metric::SurveyToCensusRatio => "survey_to_census_ratio",
            Metric::ClusterCoveragePct => "cluster_coverage_pct",
        }
    }

    pub fn is_percentage(&self) -> bool {
        matches!(self, Metric::SurveyToCensusRatio | Metric::ClusterCoveragePct)
    }

    pub fn value(&self, row: &IndicatorRow) -> f64 {
        match self {
            Metric::SurveyCount => row.survey_count as f64,
            Metric::CensusCount => row.census_count as f64,
            Metric::ClustersCovered => row.clusters_covered as f64,
            Metric::ClustersTarget => row.clusters_target as f64,
            Metric::SurveyToCensusRatio => row.survey_to_census_ratio,
            Metric::ClusterCoveragePct => row.cluster_coverage_pct,
        }
    }

    /// Value of this metric on one day of fieldwork. Only the counts are
    /// tracked per day; targets and ratios have none.
    pub fn daily_value(&self, day: &DailyTrend) -> Option<f64> {
        match self {
            Metric::SurveyCount => Some(day.survey_count as f64),
            Metric::CensusCount => Some(day.census_count as f64),
            Metric::ClustersCovered => Some(day.clusters as f64),
            _ => None,
        }
    }

    pub fn has_daily_value(&self) -> bool {
        matches!(self, Metric::SurveyCount | Metric::CensusCount | Metric::ClustersCovered)
    }
}

impl FromStr for Metric {
    type Err = BarometerError;

    fn from_str(s: &str) -> Result<Self> {
        METRICS
            .get(s.trim())
            .copied()
            .ok_or_else(|| BarometerError::UnknownMetric(s.to_string()))
    }
}

/// Map label for one value. Absent or exactly-zero values get the
/// outside-survey label instead of a misleading `0`.
pub fn format_label(value: Option<f64>, is_percentage: bool, format: &LabelFormat) -> String {
    match value {
        Some(v) if v != 0.0 && v.is_finite() => {
            if is_percentage {
                format_percent(v)
            } else {
                format_rounded(v, &format.thousands_separator)
            }
        }
        _ => format.outside_label.clone(),
    }
}

pub fn join_for_display(
    indicator_rows: &BTreeMap<String, IndicatorRow>,
    boundary_units: &[BoundaryUnit],
    metric_name: &str,
    is_percentage: bool,
) -> Result<Vec<DisplayRow>> {
    join_for_display_with(
        indicator_rows,
        boundary_units,
        metric_name,
        is_percentage,
        &LabelFormat::default(),
    )
}

pub fn join_for_display_with(
    indicator_rows: &BTreeMap<String, IndicatorRow>,
    boundary_units: &[BoundaryUnit],
    metric_name: &str,
    is_percentage: bool,
    format: &LabelFormat,
) -> Result<Vec<DisplayRow>> {
    let metric: Metric = metric_name.parse()?;

    let rows: Vec<DisplayRow> = boundary_units
        .iter()
        .map(|unit| {
            let found = indicator_rows.get(&unit.name);
            let indicator = found
                .cloned()
                .unwrap_or_else(|| IndicatorRow::empty(&unit.name, None));
            let value = metric.value(&indicator);
            DisplayRow {
                name: unit.name.clone(),
                matched: found.is_some(),
                value,
                label: format_label(found.map(|_| value), is_percentage, format),
                indicator,
            }
        })
        .collect();

    debug!(
        "joined {} of {} boundary units on '{}'",
        rows.iter().filter(|r| r.matched).count(),
        rows.len(),
        metric.name()
    );
    Ok(rows)
}

/// `(name, value)` pairs of one metric in name order, for bar charts.
pub fn metric_series(
    indicator_rows: &BTreeMap<String, IndicatorRow>,
    metric_name: &str,
) -> Result<Vec<(String, f64)>> {
    let metric: Metric = metric_name.parse()?;
    Ok(indicator_rows
        .iter()
        .map(|(name, row)| (name.clone(), metric.value(row)))
        .collect())
}

/// Day-by-day series of a count metric, labelled `dd-mm-yyyy`.
pub fn daily_series(daily: &[DailyTrend], metric_name: &str) -> Result<Vec<(String, f64)>> {
    let metric: Metric = metric_name.parse()?;
    if !metric.has_daily_value() {
        return Err(BarometerError::UnknownMetric(format!(
            "{} (daily series exist for survey_count, census_count and clusters_covered)",
            metric.name()
        )));
    }
    Ok(daily
        .iter()
        .filter_map(|d| {
            let value = metric.daily_value(d)?;
            Some((d.date.format("%d-%m-%Y").to_string(), value))
        })
        .collect())
}
