// Presentation-boundary helpers: exports and terminal previews. This is the
// only place numbers become strings.
use crate::config::LabelFormat;
use crate::error::Result;
use crate::types::{
    ChartPoint, DisplayRow, IndicatorRow, IndicatorTableRow, KeyFigureRow, MapLabelRow,
    NationalSummary,
};
use crate::util::{format_int_with, format_percent};
use serde::Serialize;
use tabled::{settings::Style, Table, Tabled};

pub fn write_csv<T: Serialize>(path: &str, rows: &[T]) -> Result<()> {
    let mut wtr = csv::Writer::from_path(path)?;
    for r in rows {
        wtr.serialize(r)?;
    }
    wtr.flush()?;
    Ok(())
}

pub fn write_json<T: Serialize>(path: &str, value: &T) -> Result<()> {
    let s = serde_json::to_string_pretty(value)?;
    std::fs::write(path, s)?;
    Ok(())
}

pub fn render_table<T>(rows: &[T]) -> String
where
    T: Tabled + Clone,
{
    if rows.is_empty() {
        return "(no rows)".to_string();
    }
    Table::new(rows.to_vec()).with(Style::markdown()).to_string()
}

pub fn preview_table_rows<T>(rows: &[T], max_rows: usize)
where
    T: Tabled + Clone,
{
    let slice: Vec<T> = rows.iter().take(max_rows).cloned().collect();
    println!("{}\n", render_table(&slice));
}

pub fn indicator_table<'a, I>(rows: I, format: &LabelFormat) -> Vec<IndicatorTableRow>
where
    I: IntoIterator<Item = &'a IndicatorRow>,
{
    let sep = format.thousands_separator.as_str();
    rows.into_iter()
        .map(|r| IndicatorTableRow {
            unit: r.name.clone(),
            parent: r.parent.clone().unwrap_or_default(),
            household_surveys: format_int_with(r.survey_count, sep),
            census_visits: format_int_with(r.census_count, sep),
            clusters_covered: format_int_with(r.clusters_covered, sep),
            clusters_total: format_int_with(r.clusters_target, sep),
            survey_census_ratio: format_percent(r.survey_to_census_ratio),
            cluster_coverage: format_percent(r.cluster_coverage_pct),
        })
        .collect()
}

/// The key-figures table of the national view.
pub fn key_figures(summary: &NationalSummary, format: &LabelFormat) -> Vec<KeyFigureRow> {
    let sep = format.thousands_separator.as_str();
    let t = &summary.totals;
    vec![
        ("Operation length", format!("{} days", summary.operation_days)),
        ("Household survey completion", format_percent(summary.survey_progress)),
        ("Cluster coverage", format_percent(summary.cluster_progress)),
        ("Clusters surveyed", format!("{} clusters", format_int_with(t.clusters_covered, sep))),
        ("Household surveys", format!("{} surveys", format_int_with(t.survey_count, sep))),
        ("Census-only visits", format!("{} visits", format_int_with(t.census_count, sep))),
        ("Mean daily cadence", format!("{:.0} surveys per day", summary.daily_survey_mean)),
        ("Cadence std-dev", format!("{:.2}", summary.daily_survey_stddev)),
    ]
    .into_iter()
    .map(|(indicator, value)| KeyFigureRow {
        indicator: indicator.to_string(),
        value,
    })
    .collect()
}

/// National totals bar chart: household surveys against census-only visits.
pub fn totals_chart(summary: &NationalSummary) -> Vec<ChartPoint> {
    let t = &summary.totals;
    vec![
        ChartPoint {
            unit: "Household surveys".to_string(),
            value: t.survey_count as f64,
        },
        ChartPoint {
            unit: "Census-only visits".to_string(),
            value: t.census_count as f64,
        },
    ]
}

pub fn chart_points(series: &[(String, f64)]) -> Vec<ChartPoint> {
    series
        .iter()
        .map(|(unit, value)| ChartPoint {
            unit: unit.clone(),
            value: *value,
        })
        .collect()
}

pub fn map_labels(rows: &[DisplayRow]) -> Vec<MapLabelRow> {
    rows.iter()
        .map(|r| MapLabelRow {
            unit: r.name.clone(),
            label: r.label.clone(),
        })
        .collect()
}
