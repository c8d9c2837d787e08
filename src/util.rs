// Utility helpers for parsing, ratios, basic statistics and display formatting.
//
// Parsing is forgiving (CSV exports of the field data are messy); formatting
// is only ever applied at the presentation boundary, never fed back into
// numbers.
use crate::error::DegenerateRatio;
use chrono::{NaiveDate, NaiveDateTime};
use num_format::{CustomFormat, Grouping, ToFormattedString};

/// Trim a geographic key. Source labels carry stray whitespace.
pub fn normalize_key(s: &str) -> String {
    s.trim().to_string()
}

/// Parse the household-survey flag. Only `0` and `1` are valid; spreadsheet
/// exports sometimes write them as `1.0`.
pub fn parse_flag_safe(s: Option<&str>) -> Option<u8> {
    let s = s?.trim();
    match s {
        "0" | "0.0" => Some(0),
        "1" | "1.0" => Some(1),
        _ => None,
    }
}

/// Parse a non-negative count such as a planned cluster number.
pub fn parse_count_safe(s: Option<&str>) -> Option<u64> {
    let s = s?.trim();
    if s.is_empty() {
        return None;
    }
    if let Ok(v) = s.parse::<u64>() {
        return Some(v);
    }
    // `12.0` style floats from spreadsheet conversion
    match s.parse::<f64>() {
        Ok(f) if f.is_finite() && f >= 0.0 && f.fract() == 0.0 => Some(f as u64),
        _ => None,
    }
}

pub fn parse_date_safe(s: Option<&str>) -> Option<NaiveDate> {
    let s = s?.trim();
    if s.is_empty() {
        return None;
    }
    if let Ok(d) = NaiveDate::parse_from_str(s, "%Y-%m-%d") {
        return Some(d);
    }
    for fmt in ["%Y-%m-%d %H:%M:%S", "%Y-%m-%dT%H:%M:%S", "%Y-%m-%d %H:%M:%S%.f"] {
        if let Ok(dt) = NaiveDateTime::parse_from_str(s, fmt) {
            return Some(dt.date());
        }
    }
    None
}

/// Number of calendar days from `first` to `last`, both included.
pub fn inclusive_days(first: NaiveDate, last: NaiveDate) -> i64 {
    (last - first).num_days() + 1
}

/// `num / den`, or `DegenerateRatio` when the denominator is zero or the
/// quotient is not finite.
pub(crate) fn checked_ratio(num: f64, den: f64) -> Result<f64, DegenerateRatio> {
    if den == 0.0 {
        return Err(DegenerateRatio);
    }
    let r = num / den;
    if r.is_finite() {
        Ok(r)
    } else {
        Err(DegenerateRatio)
    }
}

/// `num / den * 100` with the zero-on-degenerate-denominator rule.
pub fn percent(num: u64, den: u64) -> f64 {
    checked_ratio(num as f64, den as f64)
        .map(|r| r * 100.0)
        .unwrap_or(0.0)
}

pub fn average(v: &[f64]) -> f64 {
    // Returns 0 for an empty slice to avoid NaNs.
    if v.is_empty() {
        return 0.0;
    }
    let sum: f64 = v.iter().copied().sum();
    sum / v.len() as f64
}

/// Sample standard deviation (n - 1 denominator). Fewer than two values
/// yield 0.
pub fn sample_std_dev(v: &[f64]) -> f64 {
    if v.len() < 2 {
        return 0.0;
    }
    let mean = average(v);
    let ss: f64 = v.iter().map(|x| (x - mean) * (x - mean)).sum();
    let var = ss / (v.len() - 1) as f64;
    let sd = var.sqrt();
    if sd.is_finite() {
        sd
    } else {
        0.0
    }
}

fn grouping_format(separator: &str) -> CustomFormat {
    CustomFormat::builder()
        .grouping(Grouping::Standard)
        .separator(separator)
        .build()
        .unwrap_or_default()
}

/// Thousands-grouped integer, e.g. `12 345` with a space separator.
pub fn format_int_with<T>(n: T, separator: &str) -> String
where
    T: ToFormattedString,
{
    n.to_formatted_string(&grouping_format(separator))
}

pub fn format_int<T>(n: T) -> String
where
    T: ToFormattedString,
{
    format_int_with(n, " ")
}

/// Round a float and group its integer digits.
pub fn format_rounded(n: f64, separator: &str) -> String {
    let r = n.round();
    if !r.is_finite() {
        return "0".to_string();
    }
    format_int_with(r as i64, separator)
}

pub fn format_percent(n: f64) -> String {
    format!("{:.2}%", n)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn flags_only_accept_zero_and_one() {
        assert_eq!(parse_flag_safe(Some(" 1 ")), Some(1));
        assert_eq!(parse_flag_safe(Some("0.0")), Some(0));
        assert_eq!(parse_flag_safe(Some("2")), None);
        assert_eq!(parse_flag_safe(Some("")), None);
        assert_eq!(parse_flag_safe(None), None);
    }

    #[test]
    fn counts_accept_integral_floats() {
        assert_eq!(parse_count_safe(Some("42")), Some(42));
        assert_eq!(parse_count_safe(Some("42.0")), Some(42));
        assert_eq!(parse_count_safe(Some("4.5")), None);
        assert_eq!(parse_count_safe(Some("-3")), None);
        assert_eq!(parse_count_safe(Some("nan")), None);
    }

    #[test]
    fn dates_accept_datetime_exports() {
        let d = NaiveDate::from_ymd_opt(2024, 7, 3).unwrap();
        assert_eq!(parse_date_safe(Some("2024-07-03")), Some(d));
        assert_eq!(parse_date_safe(Some("2024-07-03 14:22:01")), Some(d));
        assert_eq!(parse_date_safe(Some("2024-07-03T14:22:01")), Some(d));
        assert_eq!(parse_date_safe(Some("03/07/2024")), None);
    }

    #[test]
    fn degenerate_ratios_become_zero() {
        assert_eq!(percent(5, 0), 0.0);
        assert_eq!(percent(0, 0), 0.0);
        assert_eq!(percent(2, 1), 200.0);
        assert!(checked_ratio(f64::INFINITY, 1.0).is_err());
    }

    #[test]
    fn std_dev_matches_sample_formula() {
        assert_eq!(sample_std_dev(&[3.0]), 0.0);
        let sd = sample_std_dev(&[2.0, 4.0, 4.0, 4.0, 5.0, 5.0, 7.0, 9.0]);
        assert!((sd - 2.138_089_935).abs() < 1e-6);
    }

    #[test]
    fn grouping_uses_configured_separator() {
        assert_eq!(format_int(1_234_567u64), "1 234 567");
        assert_eq!(format_int_with(35_000u64, ","), "35,000");
        assert_eq!(format_rounded(999.6, " "), "1 000");
        assert_eq!(format_percent(12.3456), "12.35%");
    }
}
