// Roll-up consistency between adjacent levels. Every level is grouped
// straight from the records, so a mismatch here points at the data (a unit
// filed under two parents) rather than at the arithmetic.
use crate::config::{Granularity, NATIONAL_UNIT};
use crate::types::Aggregation;
use serde::Serialize;
use std::collections::BTreeMap;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RollupMismatch {
    pub parent: String,
    pub field: &'static str,
    pub children_sum: u64,
    pub direct: u64,
}

/// Compare the summed survey and census counts of `children` against the
/// `parents` aggregation computed directly. A national `parents` level is
/// handed to [`check_national`].
pub fn check_rollup(children: &Aggregation, parents: &Aggregation) -> Vec<RollupMismatch> {
    if parents.granularity == Granularity::National {
        return check_national(children, parents);
    }
    let mut sums: BTreeMap<String, (u64, u64)> = BTreeMap::new();
    for row in children.rows.values() {
        let key = row.parent.clone().unwrap_or_default();
        let e = sums.entry(key).or_insert((0, 0));
        e.0 += row.survey_count;
        e.1 += row.census_count;
    }

    let mut mismatches = Vec::new();
    for (name, row) in &parents.rows {
        let (surveys, censuses) = sums.remove(name).unwrap_or((0, 0));
        push_if_differs(&mut mismatches, name, "survey_count", surveys, row.survey_count);
        push_if_differs(&mut mismatches, name, "census_count", censuses, row.census_count);
    }
    // children filed under a parent the parent level never produced
    for (name, (surveys, censuses)) in sums {
        push_if_differs(&mut mismatches, &name, "survey_count", surveys, 0);
        push_if_differs(&mut mismatches, &name, "census_count", censuses, 0);
    }
    mismatches
}

/// Compare the summed counts of every region against the national totals.
pub fn check_national(regions: &Aggregation, national: &Aggregation) -> Vec<RollupMismatch> {
    let (surveys, censuses) = regions
        .rows
        .values()
        .fold((0, 0), |(s, c), row| (s + row.survey_count, c + row.census_count));
    let (direct_surveys, direct_censuses) = national
        .national
        .as_ref()
        .map(|n| &n.totals)
        .or_else(|| national.rows.get(NATIONAL_UNIT))
        .map(|t| (t.survey_count, t.census_count))
        .unwrap_or((0, 0));

    let mut mismatches = Vec::new();
    push_if_differs(&mut mismatches, NATIONAL_UNIT, "survey_count", surveys, direct_surveys);
    push_if_differs(&mut mismatches, NATIONAL_UNIT, "census_count", censuses, direct_censuses);
    mismatches
}

fn push_if_differs(
    out: &mut Vec<RollupMismatch>,
    parent: &str,
    field: &'static str,
    children_sum: u64,
    direct: u64,
) {
    if children_sum != direct {
        out.push(RollupMismatch {
            parent: parent.to_string(),
            field,
            children_sum,
            direct,
        });
    }
}
