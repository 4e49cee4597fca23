//! Soil Report Rust Implementation
//!
//! Turns extracted soil-test tables into a scored, classified and narrated
//! report for each paddock.
//!
//! - `nutrients/`: name normalisation, aggregation and status classification
//! - `scorer`: smooth per-nutrient scores, overall score and stars
//! - `thresholds`: deviation colour bands and bar thresholds
//! - `narrative/`: section status buckets and comment sources
//! - `extraction`: upload payload to per-paddock readings
//! - `report/`: editable session, product lists, tank mix and formatters
//! - `api_server`: Axum REST API (feature `api`)

pub mod config;
pub mod error;
pub mod extraction;
pub mod narrative;
pub mod nutrients;
pub mod report;
pub mod scorer;
pub mod thresholds;

#[cfg(feature = "api")]
pub mod api_server;

// Re-export commonly used types
pub use config::ServerConfig;
pub use error::{Result, SoilError};
pub use extraction::ExtractionResponse;
pub use nutrients::{aggregate, normalize_name, CanonicalNutrient, NutrientReading, NutrientStatus};
pub use report::{ExportFormat, ReportSession, SoilReport};
pub use scorer::{overall_score, smooth_score, star_rating, OverallScore};
pub use thresholds::ThresholdConfig;

#[cfg(feature = "api")]
pub use api_server::{create_router, AppState};
