//! Comparison session and report generation.
//!
//! - [`session::AnalysisSession`]: runs every analyzer over a buffer pair
//! - [`config::AnalysisConfig`]: analyzer settings and pass/fail thresholds
//! - [`report::AnalysisReport`]: the aggregated, serializable result
//! - [`helpers`]: one-call comparison and CI assertions

pub mod config;
pub mod helpers;
pub mod report;
pub mod session;

pub use config::{AnalysisConfig, AnalysisConfigBuilder, Thresholds};
pub use report::{AnalysisReport, EdgeSection, NoiseSection, ReportMaps};
pub use session::{AnalysisSession, analyze};
