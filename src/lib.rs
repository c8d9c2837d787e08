//! Progress indicators for the household-survey field operation.
//!
//! Submission records are grouped at national, region, province and circle
//! level ([`aggregate::aggregate`]), joined against the planned cluster
//! targets, and aligned with boundary polygons for choropleth maps
//! ([`geojoin::join_for_display`]). All computations are pure functions over
//! the immutable [`context::DashboardContext`].
pub mod aggregate;
pub mod config;
pub mod context;
pub mod error;
pub mod geojoin;
pub mod hierarchy;
pub mod loader;
pub mod output;
pub mod types;
pub mod util;

pub use aggregate::aggregate;
pub use config::{Granularity, SurveyTargets};
pub use context::DashboardContext;
pub use error::{BarometerError, Result};
pub use geojoin::join_for_display;
pub use types::{Aggregation, DisplayRow, IndicatorRow, SubmissionRecord};
