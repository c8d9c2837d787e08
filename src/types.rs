use crate::config::Granularity;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use serde_json::Value as JSValue;
use std::collections::BTreeMap;
use tabled::Tabled;

#[derive(Debug, Deserialize)]
pub struct RawRecord {
    pub submission_date: Option<String>,
    pub grappe: Option<String>,
    pub expra: Option<String>,
    pub region_label: Option<String>,
    pub province_label: Option<String>,
    pub cldh_label: Option<String>,
    pub supervisor: Option<String>,
}

/// One field visit, already validated by the loader.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubmissionRecord {
    pub submission_date: NaiveDate,
    pub cluster_id: String,
    /// `1` for a completed household survey, `0` for a census-only visit.
    pub household_survey_flag: u8,
    pub region_label: String,
    pub province_label: String,
    pub circle_label: String,
    pub supervisor: Option<String>,
}

impl SubmissionRecord {
    pub fn is_survey(&self) -> bool {
        self.household_survey_flag == 1
    }

    pub fn is_census(&self) -> bool {
        self.household_survey_flag == 0
    }
}

/// A reference table kept in its tabular shape so join columns are looked up
/// by name at aggregation time.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ReferenceTable {
    pub name: String,
    pub headers: Vec<String>,
    pub rows: Vec<Vec<String>>,
}

impl ReferenceTable {
    pub fn new(name: &str, headers: Vec<String>, rows: Vec<Vec<String>>) -> Self {
        ReferenceTable {
            name: name.to_string(),
            headers,
            rows,
        }
    }

    pub fn column_index(&self, column: &str) -> Option<usize> {
        self.headers.iter().position(|h| h.trim() == column)
    }

    pub fn cell(&self, row: usize, column: usize) -> Option<&str> {
        self.rows.get(row)?.get(column).map(|s| s.as_str())
    }
}

/// The three per-level target tables.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ReferenceSet {
    pub regions: ReferenceTable,
    pub provinces: ReferenceTable,
    pub circles: ReferenceTable,
}

impl ReferenceSet {
    pub fn for_level(&self, granularity: Granularity) -> Option<&ReferenceTable> {
        match granularity {
            Granularity::National => None,
            Granularity::Region => Some(&self.regions),
            Granularity::Province => Some(&self.provinces),
            Granularity::Circle => Some(&self.circles),
        }
    }
}

/// One polygon of a boundary dataset. The geometry is carried untouched for
/// the renderer.
#[derive(Debug, Clone, PartialEq)]
pub struct BoundaryUnit {
    pub name: String,
    pub geometry: JSValue,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct IndicatorRow {
    pub name: String,
    pub parent: Option<String>,
    pub survey_count: u64,
    pub census_count: u64,
    pub clusters_covered: u64,
    pub clusters_target: u64,
    pub survey_to_census_ratio: f64,
    pub cluster_coverage_pct: f64,
}

impl IndicatorRow {
    /// Zero-activity row, used for reference units nobody has visited yet.
    pub fn empty(name: &str, parent: Option<String>) -> Self {
        IndicatorRow {
            name: name.to_string(),
            parent,
            survey_count: 0,
            census_count: 0,
            clusters_covered: 0,
            clusters_target: 0,
            survey_to_census_ratio: 0.0,
            cluster_coverage_pct: 0.0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DailyTrend {
    pub date: NaiveDate,
    pub survey_count: u64,
    pub census_count: u64,
    pub clusters: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NationalSummary {
    pub totals: IndicatorRow,
    pub survey_progress: f64,
    pub cluster_progress: f64,
    pub operation_days: i64,
    pub first_day: Option<NaiveDate>,
    pub last_day: Option<NaiveDate>,
    pub daily_survey_mean: f64,
    pub daily_survey_stddev: f64,
    pub daily: Vec<DailyTrend>,
}

/// Result of one `aggregate` call. Rows are keyed by unit name in sorted
/// order.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Aggregation {
    pub granularity: Granularity,
    pub rows: BTreeMap<String, IndicatorRow>,
    pub national: Option<NationalSummary>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProgressBar {
    pub indicator: String,
    pub achieved_pct: f64,
    pub remaining_pct: f64,
}

/// One boundary polygon annotated with its indicator for the map layer.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DisplayRow {
    pub name: String,
    pub matched: bool,
    pub value: f64,
    pub label: String,
    pub indicator: IndicatorRow,
}

#[derive(Debug, Serialize, Tabled, Clone)]
pub struct IndicatorTableRow {
    #[serde(rename = "Unit")]
    #[tabled(rename = "Unit")]
    pub unit: String,
    #[serde(rename = "Parent")]
    #[tabled(rename = "Parent")]
    pub parent: String,
    #[serde(rename = "HouseholdSurveys")]
    #[tabled(rename = "HouseholdSurveys")]
    pub household_surveys: String,
    #[serde(rename = "CensusVisits")]
    #[tabled(rename = "CensusVisits")]
    pub census_visits: String,
    #[serde(rename = "ClustersCovered")]
    #[tabled(rename = "ClustersCovered")]
    pub clusters_covered: String,
    #[serde(rename = "ClustersTotal")]
    #[tabled(rename = "ClustersTotal")]
    pub clusters_total: String,
    #[serde(rename = "SurveyCensusRatio")]
    #[tabled(rename = "SurveyCensusRatio")]
    pub survey_census_ratio: String,
    #[serde(rename = "ClusterCoverage")]
    #[tabled(rename = "ClusterCoverage")]
    pub cluster_coverage: String,
}

#[derive(Debug, Serialize, Tabled, Clone)]
pub struct KeyFigureRow {
    #[serde(rename = "Indicator")]
    #[tabled(rename = "Indicator")]
    pub indicator: String,
    #[serde(rename = "Value")]
    #[tabled(rename = "Value")]
    pub value: String,
}

#[derive(Debug, Serialize, Tabled, Clone)]
pub struct ChartPoint {
    #[serde(rename = "Unit")]
    #[tabled(rename = "Unit")]
    pub unit: String,
    #[serde(rename = "Value")]
    #[tabled(rename = "Value")]
    pub value: f64,
}

#[derive(Debug, Serialize, Tabled, Clone)]
pub struct MapLabelRow {
    #[serde(rename = "Unit")]
    #[tabled(rename = "Unit")]
    pub unit: String,
    #[serde(rename = "Label")]
    #[tabled(rename = "Label")]
    pub label: String,
}
