//! Descriptive statistics and anomaly detection for identity-enrolment counts.
//!
//! A raw table flows through [`loader`] (schema check), [`preprocess`]
//! (date parsing, derived columns, ordering), optionally [`filter`], and then
//! into [`analysis`] and [`anomaly`], which return plain serializable bundles.
//! [`session::Session`] owns the currently loaded dataset.
//!
//! Rows whose date cannot be parsed as `dd-mm-yyyy` are dropped during
//! preprocessing. This is not reported as an error.

pub mod analysis;
pub mod anomaly;
pub mod config;
pub mod error;
pub mod filter;
pub mod loader;
pub mod models;
pub mod preprocess;
pub mod report;
pub mod session;
pub mod stats;

pub use config::AnomalyParams;
pub use error::{Error, Result};
pub use filter::FilterRequest;
pub use session::{Dataset, Session};
