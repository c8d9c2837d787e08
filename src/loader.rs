// Record Store adapters: submission records and reference tables from CSV,
// boundary polygons from GeoJSON. Everything handed to the core is already
// typed and key-normalized.
use crate::error::{BarometerError, Result};
use crate::types::{BoundaryUnit, RawRecord, ReferenceTable, SubmissionRecord};
use crate::util::{normalize_key, parse_date_safe, parse_flag_safe};
use csv::ReaderBuilder;
use log::{debug, info, warn};
use serde_json::Value as JSValue;
use std::io::Read;
use std::path::Path;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LoadReport {
    pub total_rows: usize,
    pub loaded_rows: usize,
    pub parse_errors: usize,
}

pub fn load_records(path: &Path) -> Result<(Vec<SubmissionRecord>, LoadReport)> {
    let file = std::fs::File::open(path)?;
    let (records, report) = read_records(file)?;
    info!(
        "Loaded {} submission records from {} ({} rows skipped)",
        report.loaded_rows,
        path.display(),
        report.parse_errors
    );
    Ok((records, report))
}

pub fn read_records<R: Read>(input: R) -> Result<(Vec<SubmissionRecord>, LoadReport)> {
    let mut rdr = ReaderBuilder::new().flexible(true).from_reader(input);
    let mut total_rows = 0usize;
    let mut parse_errors = 0usize;
    let mut records: Vec<SubmissionRecord> = Vec::new();

    for result in rdr.deserialize::<RawRecord>() {
        total_rows += 1;
        let row = match result {
            Ok(r) => r,
            Err(e) => {
                debug!("row {}: {}", total_rows, e);
                parse_errors += 1;
                continue;
            }
        };

        let submission_date = match parse_date_safe(row.submission_date.as_deref()) {
            Some(d) => d,
            None => {
                parse_errors += 1;
                continue;
            }
        };
        let cluster_id = match row.grappe.as_deref().map(str::trim) {
            Some(g) if !g.is_empty() => g.to_string(),
            _ => {
                parse_errors += 1;
                continue;
            }
        };
        let household_survey_flag = match parse_flag_safe(row.expra.as_deref()) {
            Some(f) => f,
            None => {
                warn!("row {}: household survey flag {:?} is not 0 or 1", total_rows, row.expra);
                parse_errors += 1;
                continue;
            }
        };

        let region_label = normalize_key(row.region_label.as_deref().unwrap_or_default());
        let province_label = normalize_key(row.province_label.as_deref().unwrap_or_default());
        let circle_label = normalize_key(row.cldh_label.as_deref().unwrap_or_default());
        let supervisor = row
            .supervisor
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty());

        records.push(SubmissionRecord {
            submission_date,
            cluster_id,
            household_survey_flag,
            region_label,
            province_label,
            circle_label,
            supervisor,
        });
    }

    let report = LoadReport {
        total_rows,
        loaded_rows: records.len(),
        parse_errors,
    };
    Ok((records, report))
}

pub fn load_reference_table(name: &str, path: &Path) -> Result<ReferenceTable> {
    let file = std::fs::File::open(path)?;
    let table = read_reference_table(name, file)?;
    info!(
        "Loaded reference table '{}' ({} rows) from {}",
        name,
        table.rows.len(),
        path.display()
    );
    Ok(table)
}

pub fn read_reference_table<R: Read>(name: &str, input: R) -> Result<ReferenceTable> {
    let mut rdr = ReaderBuilder::new().flexible(true).from_reader(input);
    let headers: Vec<String> = rdr.headers()?.iter().map(normalize_key).collect();
    let mut rows: Vec<Vec<String>> = Vec::new();
    for result in rdr.records() {
        let record = result?;
        rows.push(record.iter().map(normalize_key).collect());
    }
    Ok(ReferenceTable::new(name, headers, rows))
}

pub fn load_boundaries(path: &Path, name_property: &str) -> Result<Vec<BoundaryUnit>> {
    let contents = std::fs::read_to_string(path)?;
    let units = parse_boundaries(&contents, name_property)?;
    info!(
        "Loaded {} boundary units from {}",
        units.len(),
        path.display()
    );
    Ok(units)
}

/// Read a GeoJSON FeatureCollection into one unit per named feature.
pub fn parse_boundaries(contents: &str, name_property: &str) -> Result<Vec<BoundaryUnit>> {
    let js: JSValue = serde_json::from_str(contents)?;
    if js.get("type").and_then(JSValue::as_str) != Some("FeatureCollection") {
        return Err(BarometerError::InvalidData(
            "boundary file is not a GeoJSON FeatureCollection".to_string(),
        ));
    }
    let features = js
        .get("features")
        .and_then(JSValue::as_array)
        .ok_or_else(|| {
            BarometerError::InvalidData("FeatureCollection has no features".to_string())
        })?;

    let mut units: Vec<BoundaryUnit> = Vec::new();
    for (idx, feature) in features.iter().enumerate() {
        let name = feature
            .get("properties")
            .and_then(|p| p.get(name_property))
            .and_then(JSValue::as_str)
            .map(normalize_key)
            .filter(|s| !s.is_empty());
        let Some(name) = name else {
            warn!("feature {} has no '{}' property, skipped", idx, name_property);
            continue;
        };
        let geometry = feature.get("geometry").cloned().unwrap_or(JSValue::Null);
        units.push(BoundaryUnit { name, geometry });
    }
    Ok(units)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use std::io::Write;

    const RECORDS: &str = "\
submission_date,grappe,expra,region_label,province_label,cldh_label,supervisor
2024-07-01,101,1,R1,P1, C1 ,Amina
2024-07-01 09:30:00,101,0,R1,P1,C1,
2024-07-02,102,1.0,R1,P2,C2,Youssef
2024-07-02,103,3,R1,P2,C2,Youssef
bad-date,104,1,R1,P2,C2,Youssef
2024-07-03,,1,R1,P2,C2,Youssef
";

    #[test]
    fn records_are_validated_and_trimmed() {
        let (records, report) = read_records(RECORDS.as_bytes()).unwrap();
        assert_eq!(report.total_rows, 6);
        assert_eq!(report.loaded_rows, 3);
        assert_eq!(report.parse_errors, 3);
        assert_eq!(records[0].circle_label, "C1");
        assert_eq!(records[0].supervisor.as_deref(), Some("Amina"));
        assert_eq!(records[1].supervisor, None);
        assert_eq!(
            records[1].submission_date,
            NaiveDate::from_ymd_opt(2024, 7, 1).unwrap()
        );
        assert_eq!(records[2].household_survey_flag, 1);
    }

    #[test]
    fn records_load_from_disk() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("combined_data.csv");
        let mut f = std::fs::File::create(&path).unwrap();
        f.write_all(RECORDS.as_bytes()).unwrap();
        let (records, _) = load_records(&path).unwrap();
        assert_eq!(records.len(), 3);
    }

    #[test]
    fn missing_file_is_an_io_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = load_records(&dir.path().join("nope.csv")).unwrap_err();
        assert!(matches!(err, BarometerError::Io(_)));
    }

    #[test]
    fn reference_table_keeps_headers() {
        let csv = "region , nb_grappes\n R1 ,120\nR2,80\n";
        let t = read_reference_table("regions", csv.as_bytes()).unwrap();
        assert_eq!(t.column_index("region"), Some(0));
        assert_eq!(t.column_index("nb_grappes"), Some(1));
        assert_eq!(t.cell(0, 0), Some("R1"));
        assert_eq!(t.rows.len(), 2);
    }

    #[test]
    fn boundaries_skip_unnamed_features() {
        let gj = r#"{
            "type": "FeatureCollection",
            "features": [
                {"type": "Feature", "properties": {"region": "R1"},
                 "geometry": {"type": "Polygon", "coordinates": []}},
                {"type": "Feature", "properties": {"region": null}, "geometry": null},
                {"type": "Feature", "properties": {"region": "R2 "}, "geometry": null}
            ]
        }"#;
        let units = parse_boundaries(gj, "region").unwrap();
        let names: Vec<&str> = units.iter().map(|u| u.name.as_str()).collect();
        assert_eq!(names, vec!["R1", "R2"]);
        assert_eq!(units[0].geometry["type"], "Polygon");
    }

    #[test]
    fn boundaries_must_be_a_feature_collection() {
        let err = parse_boundaries(r#"{"type": "Feature"}"#, "name").unwrap_err();
        assert!(matches!(err, BarometerError::InvalidData(_)));
    }
}
