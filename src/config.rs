// Survey-design constants, per-level pipeline configuration and the
// optional JSON configuration file.
use crate::error::{BarometerError, Result};
use crate::types::SubmissionRecord;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

/// Planned number of completed household surveys for the whole operation.
pub const DEFAULT_HOUSEHOLD_SURVEY_TARGET: u64 = 35_000;
/// Planned number of sampled clusters for the whole operation.
pub const DEFAULT_CLUSTER_TARGET: u64 = 10_225;

/// Label shown on a map for a unit without measured activity.
pub const OUTSIDE_SURVEY_LABEL: &str = "Hors enquête";

/// Key of the single row produced at national level.
pub const NATIONAL_UNIT: &str = "national";

/// Column names accepted for a unit's planned cluster count.
const TARGET_COLUMNS: &[&str] = &["nb_grappes", "nb_grappe"];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SurveyTargets {
    pub household_surveys: u64,
    pub clusters: u64,
}

impl Default for SurveyTargets {
    fn default() -> Self {
        SurveyTargets {
            household_surveys: DEFAULT_HOUSEHOLD_SURVEY_TARGET,
            clusters: DEFAULT_CLUSTER_TARGET,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LabelFormat {
    pub thousands_separator: String,
    pub outside_label: String,
}

impl Default for LabelFormat {
    fn default() -> Self {
        LabelFormat {
            thousands_separator: " ".to_string(),
            outside_label: OUTSIDE_SURVEY_LABEL.to_string(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Granularity {
    National,
    Region,
    Province,
    Circle,
}

impl Granularity {
    pub const ALL: [Granularity; 4] = [
        Granularity::National,
        Granularity::Region,
        Granularity::Province,
        Granularity::Circle,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Granularity::National => "national",
            Granularity::Region => "region",
            Granularity::Province => "province",
            Granularity::Circle => "circle",
        }
    }

    /// The level directly above this one, if any.
    pub fn parent(&self) -> Option<Granularity> {
        match self {
            Granularity::National => None,
            Granularity::Region => Some(Granularity::National),
            Granularity::Province => Some(Granularity::Region),
            Granularity::Circle => Some(Granularity::Province),
        }
    }

    pub fn spec(&self) -> LevelSpec {
        match self {
            Granularity::National => LevelSpec {
                granularity: *self,
                group_key: national_key,
                parent_key: None,
                join_column: None,
                target_columns: TARGET_COLUMNS,
                parent_column: None,
            },
            Granularity::Region => LevelSpec {
                granularity: *self,
                group_key: region_key,
                parent_key: None,
                join_column: Some("region"),
                target_columns: TARGET_COLUMNS,
                parent_column: None,
            },
            Granularity::Province => LevelSpec {
                granularity: *self,
                group_key: province_key,
                parent_key: Some(region_key),
                join_column: Some("province"),
                target_columns: TARGET_COLUMNS,
                parent_column: Some("region_label"),
            },
            Granularity::Circle => LevelSpec {
                granularity: *self,
                group_key: circle_key,
                parent_key: Some(province_key),
                join_column: Some("cldh_label"),
                target_columns: TARGET_COLUMNS,
                parent_column: Some("province_label"),
            },
        }
    }
}

impl fmt::Display for Granularity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Granularity {
    type Err = BarometerError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "national" => Ok(Granularity::National),
            "region" => Ok(Granularity::Region),
            "province" => Ok(Granularity::Province),
            "circle" => Ok(Granularity::Circle),
            _ => Err(BarometerError::InvalidGranularity(format!(
                "'{}' (expected national, region, province or circle)",
                s
            ))),
        }
    }
}

pub type KeyFn = fn(&SubmissionRecord) -> &str;

fn national_key(_: &SubmissionRecord) -> &str {
    NATIONAL_UNIT
}

fn region_key(r: &SubmissionRecord) -> &str {
    &r.region_label
}

fn province_key(r: &SubmissionRecord) -> &str {
    &r.province_label
}

fn circle_key(r: &SubmissionRecord) -> &str {
    &r.circle_label
}

/// Everything the aggregation pipeline needs to know about one level.
#[derive(Debug, Clone, Copy)]
pub struct LevelSpec {
    pub granularity: Granularity,
    pub group_key: KeyFn,
    pub parent_key: Option<KeyFn>,
    /// Column of the reference table holding the unit name. `None` at
    /// national level, which has no reference table.
    pub join_column: Option<&'static str>,
    pub target_columns: &'static [&'static str],
    pub parent_column: Option<&'static str>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DataPaths {
    pub records: PathBuf,
    pub regions: PathBuf,
    pub provinces: PathBuf,
    pub circles: PathBuf,
    pub region_boundaries: PathBuf,
    pub province_boundaries: PathBuf,
}

impl Default for DataPaths {
    fn default() -> Self {
        DataPaths {
            records: PathBuf::from("combined_data.csv"),
            regions: PathBuf::from("grappes_regions.csv"),
            provinces: PathBuf::from("provinces.csv"),
            circles: PathBuf::from("cercles.csv"),
            region_boundaries: PathBuf::from("updated_maroc.geojson"),
            province_boundaries: PathBuf::from("updated_provinces.json"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BarometerConfig {
    #[serde(rename = "dataDir")]
    pub data_dir: PathBuf,
    pub paths: DataPaths,
    pub targets: SurveyTargets,
    #[serde(rename = "labelFormat")]
    pub label_format: LabelFormat,
    #[serde(rename = "regionNameProperty")]
    pub region_name_property: String,
    #[serde(rename = "provinceNameProperty")]
    pub province_name_property: String,
}

impl Default for BarometerConfig {
    fn default() -> Self {
        BarometerConfig {
            data_dir: PathBuf::from("data"),
            paths: DataPaths::default(),
            targets: SurveyTargets::default(),
            label_format: LabelFormat::default(),
            region_name_property: "region".to_string(),
            province_name_property: "name".to_string(),
        }
    }
}

impl BarometerConfig {
    pub fn from_file(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)?;
        let config: BarometerConfig = serde_json::from_str(&contents)?;
        Ok(config)
    }

    /// Resolve a data path against `data_dir` unless it is already absolute.
    pub fn resolve(&self, p: &Path) -> PathBuf {
        if p.is_absolute() {
            p.to_path_buf()
        } else {
            self.data_dir.join(p)
        }
    }
}
