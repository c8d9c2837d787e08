use thiserror::Error;

#[derive(Error, Debug)]
pub enum BarometerError {
    #[error("Invalid granularity: {0}")]
    InvalidGranularity(String),

    #[error("Missing join key: reference table '{table}' has no column '{column}'")]
    MissingJoinKey { table: String, column: String },

    #[error("Unknown metric: {0}")]
    UnknownMetric(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("InvalidData: {0}")]
    InvalidData(String),
}

pub type Result<T> = std::result::Result<T, BarometerError>;

/// A division whose denominator is zero or whose result is not finite.
///
/// Never leaves the crate: every producer maps it to `0.0` on the spot.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
#[error("degenerate ratio")]
pub(crate) struct DegenerateRatio;
