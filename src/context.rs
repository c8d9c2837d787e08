// Load-once, read-only state shared by every aggregation call. Nothing in
// here is ever mutated after construction; wrap it in an `Arc` to share it
// between sessions.
use crate::aggregate;
use crate::config::{BarometerConfig, Granularity, LabelFormat, SurveyTargets};
use crate::error::{BarometerError, Result};
use crate::geojoin;
use crate::loader::{self, LoadReport};
use crate::types::{
    Aggregation, BoundaryUnit, DisplayRow, IndicatorRow, ReferenceSet, SubmissionRecord,
};
use std::collections::BTreeMap;

#[derive(Debug, Clone)]
pub struct DashboardContext {
    records: Vec<SubmissionRecord>,
    references: ReferenceSet,
    region_boundaries: Vec<BoundaryUnit>,
    province_boundaries: Vec<BoundaryUnit>,
    targets: SurveyTargets,
    label_format: LabelFormat,
}

impl DashboardContext {
    pub fn new(
        records: Vec<SubmissionRecord>,
        references: ReferenceSet,
        region_boundaries: Vec<BoundaryUnit>,
        province_boundaries: Vec<BoundaryUnit>,
        targets: SurveyTargets,
        label_format: LabelFormat,
    ) -> Self {
        DashboardContext {
            records,
            references,
            region_boundaries,
            province_boundaries,
            targets,
            label_format,
        }
    }

    /// Read every table named by `config`. Fails on the first unreadable
    /// file.
    pub fn load(config: &BarometerConfig) -> Result<(Self, LoadReport)> {
        let paths = &config.paths;
        let (records, report) = loader::load_records(&config.resolve(&paths.records))?;
        let references = ReferenceSet {
            regions: loader::load_reference_table("regions", &config.resolve(&paths.regions))?,
            provinces: loader::load_reference_table(
                "provinces",
                &config.resolve(&paths.provinces),
            )?,
            circles: loader::load_reference_table("circles", &config.resolve(&paths.circles))?,
        };
        let region_boundaries = loader::load_boundaries(
            &config.resolve(&paths.region_boundaries),
            &config.region_name_property,
        )?;
        let province_boundaries = loader::load_boundaries(
            &config.resolve(&paths.province_boundaries),
            &config.province_name_property,
        )?;
        let ctx = DashboardContext::new(
            records,
            references,
            region_boundaries,
            province_boundaries,
            config.targets,
            config.label_format.clone(),
        );
        Ok((ctx, report))
    }

    pub fn records(&self) -> &[SubmissionRecord] {
        &self.records
    }

    pub fn label_format(&self) -> &LabelFormat {
        &self.label_format
    }

    pub fn aggregate(&self, granularity: &str) -> Result<Aggregation> {
        aggregate::aggregate(&self.records, granularity, &self.references, &self.targets)
    }

    /// Boundary polygons for a level. Only regions and provinces are mapped.
    pub fn boundaries(&self, granularity: Granularity) -> Result<&[BoundaryUnit]> {
        match granularity {
            Granularity::Region => Ok(&self.region_boundaries),
            Granularity::Province => Ok(&self.province_boundaries),
            other => Err(BarometerError::InvalidGranularity(format!(
                "'{}' has no boundary dataset (maps exist for region and province)",
                other
            ))),
        }
    }

    pub fn join_for_display(
        &self,
        granularity: Granularity,
        indicator_rows: &BTreeMap<String, IndicatorRow>,
        metric_name: &str,
        is_percentage: bool,
    ) -> Result<Vec<DisplayRow>> {
        let units = self.boundaries(granularity)?;
        geojoin::join_for_display_with(
            indicator_rows,
            units,
            metric_name,
            is_percentage,
            &self.label_format,
        )
    }
}
