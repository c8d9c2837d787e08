// The aggregation pipeline: one code path for every level, parameterized by
// `LevelSpec`. Each level groups the raw records directly, so counts at
// different levels can never drift apart through intermediate rounding.
use crate::config::{Granularity, LevelSpec, SurveyTargets, NATIONAL_UNIT};
use crate::error::{BarometerError, Result};
use crate::types::{
    Aggregation, DailyTrend, IndicatorRow, NationalSummary, ProgressBar, ReferenceSet,
    ReferenceTable, SubmissionRecord,
};
use crate::util::{average, inclusive_days, parse_count_safe, percent, sample_std_dev};
use chrono::NaiveDate;
use log::{debug, warn};
use std::collections::{BTreeMap, HashMap, HashSet};

#[derive(Default)]
struct Acc<'r> {
    surveys: u64,
    censuses: u64,
    clusters: HashSet<&'r str>,
    parent: Option<&'r str>,
}

impl<'r> Acc<'r> {
    fn add(&mut self, r: &'r SubmissionRecord) {
        if r.is_survey() {
            self.surveys += 1;
        } else if r.is_census() {
            self.censuses += 1;
        }
        self.clusters.insert(r.cluster_id.as_str());
    }
}

struct Target {
    count: Option<u64>,
    parent: Option<String>,
}

/// Aggregate `records` at the level named by `granularity`.
///
/// Fails without producing any row when the level is unknown or the level's
/// reference table lacks its join column.
pub fn aggregate(
    records: &[SubmissionRecord],
    granularity: &str,
    references: &ReferenceSet,
    targets: &SurveyTargets,
) -> Result<Aggregation> {
    let level: Granularity = granularity.parse()?;
    aggregate_level(records, &level.spec(), references.for_level(level), targets)
}

pub fn aggregate_level(
    records: &[SubmissionRecord],
    spec: &LevelSpec,
    reference: Option<&ReferenceTable>,
    targets: &SurveyTargets,
) -> Result<Aggregation> {
    // Resolve the join before touching the records: all or nothing.
    let reference_targets = match (spec.join_column, reference) {
        (Some(column), Some(table)) => resolve_targets(table, spec, column)?,
        (Some(column), None) => {
            return Err(BarometerError::MissingJoinKey {
                table: spec.granularity.to_string(),
                column: column.to_string(),
            })
        }
        (None, _) => HashMap::new(),
    };

    let groups = group_records(records, spec);
    debug!(
        "{}: {} records in {} groups",
        spec.granularity,
        records.len(),
        groups.len()
    );

    if spec.granularity == Granularity::National {
        let totals = build_row(
            NATIONAL_UNIT,
            groups.get(NATIONAL_UNIT),
            Some(targets.clusters),
            None,
        );
        let summary = national_summary(records, totals.clone(), targets);
        let mut rows = BTreeMap::new();
        rows.insert(NATIONAL_UNIT.to_string(), totals);
        return Ok(Aggregation {
            granularity: spec.granularity,
            rows,
            national: Some(summary),
        });
    }

    let mut rows: BTreeMap<String, IndicatorRow> = BTreeMap::new();
    for (name, target) in reference_targets {
        let acc = groups.get(name.as_str());
        let parent = acc
            .and_then(|a| a.parent)
            .map(str::to_string)
            .or(target.parent);
        let row = build_row(&name, acc, target.count, parent);
        rows.insert(name, row);
    }
    for (name, acc) in &groups {
        if rows.contains_key(*name) {
            continue;
        }
        warn!(
            "{} '{}' has submissions but no reference target",
            spec.granularity, name
        );
        let row = build_row(name, Some(acc), None, acc.parent.map(str::to_string));
        rows.insert(name.to_string(), row);
    }

    Ok(Aggregation {
        granularity: spec.granularity,
        rows,
        national: None,
    })
}

fn group_records<'r>(
    records: &'r [SubmissionRecord],
    spec: &LevelSpec,
) -> BTreeMap<&'r str, Acc<'r>> {
    let mut groups: BTreeMap<&'r str, Acc<'r>> = BTreeMap::new();
    for r in records {
        let acc = groups.entry((spec.group_key)(r)).or_default();
        if acc.parent.is_none() {
            acc.parent = spec.parent_key.map(|key| key(r));
        }
        acc.add(r);
    }
    groups
}

fn resolve_targets(
    table: &ReferenceTable,
    spec: &LevelSpec,
    join_column: &str,
) -> Result<HashMap<String, Target>> {
    let join_idx = table
        .column_index(join_column)
        .ok_or_else(|| BarometerError::MissingJoinKey {
            table: table.name.clone(),
            column: join_column.to_string(),
        })?;
    let target_idx = spec
        .target_columns
        .iter()
        .find_map(|c| table.column_index(c));
    if target_idx.is_none() {
        warn!(
            "reference table '{}' has no cluster target column, coverage will be 0",
            table.name
        );
    }
    let parent_idx = spec.parent_column.and_then(|c| table.column_index(c));

    let mut out: HashMap<String, Target> = HashMap::new();
    for row in 0..table.rows.len() {
        let name = match table.cell(row, join_idx) {
            Some(n) if !n.is_empty() => n,
            _ => continue,
        };
        if out.contains_key(name) {
            warn!("reference table '{}' lists '{}' twice, keeping the first", table.name, name);
            continue;
        }
        let count = target_idx.and_then(|i| parse_count_safe(table.cell(row, i)));
        let parent = parent_idx
            .and_then(|i| table.cell(row, i))
            .filter(|p| !p.is_empty())
            .map(str::to_string);
        out.insert(name.to_string(), Target { count, parent });
    }
    Ok(out)
}

fn build_row(
    name: &str,
    acc: Option<&Acc>,
    target: Option<u64>,
    parent: Option<String>,
) -> IndicatorRow {
    let mut row = IndicatorRow::empty(name, parent);
    row.clusters_target = target.unwrap_or(0);
    if let Some(acc) = acc {
        row.survey_count = acc.surveys;
        row.census_count = acc.censuses;
        row.clusters_covered = acc.clusters.len() as u64;
    }
    row.survey_to_census_ratio = percent(row.survey_count, row.census_count);
    row.cluster_coverage_pct = percent(row.clusters_covered, row.clusters_target);
    row
}

fn national_summary(
    records: &[SubmissionRecord],
    totals: IndicatorRow,
    targets: &SurveyTargets,
) -> NationalSummary {
    let mut by_day: BTreeMap<NaiveDate, Acc> = BTreeMap::new();
    for r in records {
        by_day.entry(r.submission_date).or_default().add(r);
    }

    let first_day = by_day.keys().next().copied();
    let last_day = by_day.keys().next_back().copied();
    let operation_days = match (first_day, last_day) {
        (Some(first), Some(last)) => inclusive_days(first, last),
        _ => 0,
    };

    let per_day: Vec<f64> = by_day.values().map(|a| a.surveys as f64).collect();
    let daily: Vec<DailyTrend> = by_day
        .iter()
        .map(|(date, acc)| DailyTrend {
            date: *date,
            survey_count: acc.surveys,
            census_count: acc.censuses,
            clusters: acc.clusters.len() as u64,
        })
        .collect();

    NationalSummary {
        survey_progress: percent(totals.survey_count, targets.household_surveys),
        cluster_progress: percent(totals.clusters_covered, targets.clusters),
        operation_days,
        first_day,
        last_day,
        daily_survey_mean: average(&per_day),
        daily_survey_stddev: sample_std_dev(&per_day),
        daily,
        totals,
    }
}

/// Rows of `aggregation` whose parent unit is `parent`: the provinces of one
/// region, or the circles of one province.
pub fn filter_by_parent(
    aggregation: &Aggregation,
    parent: &str,
) -> BTreeMap<String, IndicatorRow> {
    let parent = parent.trim();
    aggregation
        .rows
        .iter()
        .filter(|(_, row)| row.parent.as_deref() == Some(parent))
        .map(|(name, row)| (name.clone(), row.clone()))
        .collect()
}

/// Distinct parent names present in `aggregation`, sorted.
pub fn parents(aggregation: &Aggregation) -> Vec<String> {
    let set: std::collections::BTreeSet<&str> = aggregation
        .rows
        .values()
        .filter_map(|row| row.parent.as_deref())
        .collect();
    set.into_iter().map(str::to_string).collect()
}

/// Achieved and remaining share of the two national targets.
pub fn progress_bars(summary: &NationalSummary) -> Vec<ProgressBar> {
    [
        ("household_surveys", summary.survey_progress),
        ("cluster_coverage", summary.cluster_progress),
    ]
    .into_iter()
    .map(|(indicator, achieved)| ProgressBar {
        indicator: indicator.to_string(),
        achieved_pct: achieved,
        remaining_pct: (100.0 - achieved).max(0.0),
    })
    .collect()
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    pub(crate) fn day(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 7, d).unwrap()
    }

    pub(crate) fn rec(
        d: u32,
        grappe: &str,
        expra: u8,
        region: &str,
        province: &str,
        circle: &str,
    ) -> SubmissionRecord {
        SubmissionRecord {
            submission_date: day(d),
            cluster_id: grappe.to_string(),
            household_survey_flag: expra,
            region_label: region.to_string(),
            province_label: province.to_string(),
            circle_label: circle.to_string(),
            supervisor: None,
        }
    }

    pub(crate) fn table(name: &str, headers: &[&str], rows: &[&[&str]]) -> ReferenceTable {
        ReferenceTable::new(
            name,
            headers.iter().map(|h| h.to_string()).collect(),
            rows.iter()
                .map(|r| r.iter().map(|c| c.to_string()).collect())
                .collect(),
        )
    }

    pub(crate) fn references() -> ReferenceSet {
        ReferenceSet {
            regions: table(
                "regions",
                &["region", "nb_grappes"],
                &[&["R1", "4"], &["R2", "10"], &["R3", "5"]],
            ),
            provinces: table(
                "provinces",
                &["province", "nb_grappe", "region_label"],
                &[&["P1", "2"], &["P2", "2"], &["P3", "3"], &["P9", "4", "R3"]],
            ),
            circles: table(
                "circles",
                &["cldh_label", "nb_grappe", "province_label"],
                &[&["C1", "1", "P1"], &["C2", "1", "P1"], &["C3", "2", "P2"], &["C4", "3", "P3"]],
            ),
        }
    }

    pub(crate) fn sample() -> Vec<SubmissionRecord> {
        vec![
            rec(1, "1", 1, "R1", "P1", "C1"),
            rec(1, "1", 0, "R1", "P1", "C1"),
            rec(2, "2", 1, "R1", "P1", "C2"),
            rec(3, "3", 1, "R1", "P2", "C3"),
            rec(3, "3", 1, "R1", "P2", "C3"),
            rec(5, "4", 0, "R2", "P3", "C4"),
            rec(5, "5", 1, "R2", "P3", "C4"),
        ]
    }

    #[test]
    fn region_counts_and_ratio() {
        let records = vec![
            rec(1, "1", 1, "R1", "P1", "C1"),
            rec(1, "1", 0, "R1", "P1", "C1"),
            rec(1, "2", 1, "R1", "P1", "C1"),
        ];
        let agg = aggregate(&records, "region", &references(), &SurveyTargets::default()).unwrap();
        let r1 = &agg.rows["R1"];
        assert_eq!(r1.survey_count, 2);
        assert_eq!(r1.census_count, 1);
        assert_eq!(r1.clusters_covered, 2);
        assert_eq!(r1.survey_to_census_ratio, 200.0);
        assert_eq!(r1.clusters_target, 4);
        assert_eq!(r1.cluster_coverage_pct, 50.0);
    }

    #[test]
    fn ratio_is_zero_without_census_visits() {
        let agg =
            aggregate(&sample(), "province", &references(), &SurveyTargets::default()).unwrap();
        let p2 = &agg.rows["P2"];
        assert_eq!(p2.census_count, 0);
        assert_eq!(p2.survey_to_census_ratio, 0.0);
        for g in Granularity::ALL {
            let agg =
                aggregate(&sample(), g.as_str(), &references(), &SurveyTargets::default()).unwrap();
            for row in agg.rows.values() {
                assert!(row.survey_to_census_ratio.is_finite());
                assert!(row.cluster_coverage_pct.is_finite());
            }
        }
    }

    #[test]
    fn reference_units_without_records_are_zero_filled() {
        let agg = aggregate(&sample(), "region", &references(), &SurveyTargets::default()).unwrap();
        let r3 = &agg.rows["R3"];
        assert_eq!(r3.survey_count, 0);
        assert_eq!(r3.census_count, 0);
        assert_eq!(r3.clusters_covered, 0);
        assert_eq!(r3.clusters_target, 5);
        assert_eq!(r3.cluster_coverage_pct, 0.0);
        assert_eq!(agg.rows.len(), 3);
    }

    #[test]
    fn observed_units_missing_from_reference_are_kept() {
        let mut records = sample();
        records.push(rec(4, "9", 1, "R1", "P1", "C99"));
        let agg = aggregate(&records, "circle", &references(), &SurveyTargets::default()).unwrap();
        let c99 = &agg.rows["C99"];
        assert_eq!(c99.survey_count, 1);
        assert_eq!(c99.clusters_target, 0);
        assert_eq!(c99.cluster_coverage_pct, 0.0);
        assert_eq!(c99.parent.as_deref(), Some("P1"));
    }

    #[test]
    fn parent_falls_back_to_reference_column() {
        let agg =
            aggregate(&sample(), "province", &references(), &SurveyTargets::default()).unwrap();
        assert_eq!(agg.rows["P1"].parent.as_deref(), Some("R1"));
        assert_eq!(agg.rows["P9"].parent.as_deref(), Some("R3"));
        assert_eq!(filter_by_parent(&agg, "R1").len(), 2);
        assert_eq!(filter_by_parent(&agg, " R3 ").len(), 1);
        assert_eq!(parents(&agg), vec!["R1", "R2", "R3"]);
    }

    #[test]
    fn missing_join_column_aborts() {
        let mut refs = references();
        refs.provinces = table("provinces", &["prov", "nb_grappe"], &[&["P1", "2"]]);
        match aggregate(&sample(), "province", &refs, &SurveyTargets::default()) {
            Err(BarometerError::MissingJoinKey { table, column }) => {
                assert_eq!(table, "provinces");
                assert_eq!(column, "province");
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn unknown_level_aborts() {
        let err =
            aggregate(&sample(), "district", &references(), &SurveyTargets::default()).unwrap_err();
        assert!(matches!(err, BarometerError::InvalidGranularity(_)));
    }

    #[test]
    fn missing_target_column_means_zero_coverage() {
        let mut refs = references();
        refs.regions = table("regions", &["region"], &[&["R1"]]);
        let agg = aggregate(&sample(), "region", &refs, &SurveyTargets::default()).unwrap();
        assert_eq!(agg.rows["R1"].clusters_target, 0);
        assert_eq!(agg.rows["R1"].cluster_coverage_pct, 0.0);
    }

    #[test]
    fn national_progress_reaches_exactly_one_hundred() {
        let records: Vec<SubmissionRecord> = (0..35_000)
            .map(|i| rec(1 + (i % 3) as u32, &format!("{}", i % 10_225), 1, "R1", "P1", "C1"))
            .collect();
        let agg =
            aggregate(&records, "national", &references(), &SurveyTargets::default()).unwrap();
        let summary = agg.national.unwrap();
        assert_eq!(summary.totals.survey_count, 35_000);
        assert_eq!(summary.survey_progress, 100.0);
        assert_eq!(summary.cluster_progress, 100.0);
    }

    #[test]
    fn operation_days_count_gaps() {
        let records = vec![
            rec(1, "1", 1, "R1", "P1", "C1"),
            rec(3, "2", 1, "R1", "P1", "C1"),
            rec(5, "3", 0, "R1", "P1", "C1"),
        ];
        let agg =
            aggregate(&records, "national", &references(), &SurveyTargets::default()).unwrap();
        let summary = agg.national.unwrap();
        assert_eq!(summary.operation_days, 5);
        assert_eq!(summary.first_day, Some(day(1)));
        assert_eq!(summary.last_day, Some(day(5)));
        assert_eq!(summary.daily.len(), 3);
    }

    #[test]
    fn daily_cadence_statistics() {
        let agg =
            aggregate(&sample(), "national", &references(), &SurveyTargets::default()).unwrap();
        let summary = agg.national.unwrap();
        // surveys per day: d1=1, d2=1, d3=2, d5=1
        assert_eq!(summary.daily_survey_mean, 1.25);
        assert!((summary.daily_survey_stddev - 0.5).abs() < 1e-12);
        assert_eq!(summary.daily[2].clusters, 1);
        assert_eq!(summary.daily[3].census_count, 1);
        assert_eq!(summary.totals.survey_count, 5);
        assert_eq!(summary.totals.census_count, 2);
        assert_eq!(summary.totals.clusters_covered, 5);
    }

    #[test]
    fn overridden_targets_are_used() {
        let targets = SurveyTargets {
            household_surveys: 10,
            clusters: 20,
        };
        let agg = aggregate(&sample(), "national", &references(), &targets).unwrap();
        let summary = agg.national.unwrap();
        assert_eq!(summary.survey_progress, 50.0);
        assert_eq!(summary.cluster_progress, 25.0);
        let bars = progress_bars(&summary);
        assert_eq!(bars[0].remaining_pct, 50.0);
        assert_eq!(bars[1].achieved_pct, 25.0);
    }

    #[test]
    fn empty_records_still_list_reference_units() {
        let agg = aggregate(&[], "circle", &references(), &SurveyTargets::default()).unwrap();
        assert_eq!(agg.rows.len(), 4);
        let nat = aggregate(&[], "national", &references(), &SurveyTargets::default()).unwrap();
        assert_eq!(nat.national.unwrap().operation_days, 0);
    }

    #[test]
    fn aggregation_is_repeatable() {
        let records = sample();
        for g in Granularity::ALL {
            let a =
                aggregate(&records, g.as_str(), &references(), &SurveyTargets::default()).unwrap();
            let b =
                aggregate(&records, g.as_str(), &references(), &SurveyTargets::default()).unwrap();
            assert_eq!(a, b);
        }
    }
}
