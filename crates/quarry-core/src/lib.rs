//! Quarry Core
//!
//! Stable domain types shared by every other crate: models, the run
//! configuration, the error taxonomy, and the run report.

pub mod config;
pub mod error;
pub mod model;
pub mod report;

pub use config::Config;
pub use error::QuarryError;
pub use model::{Materialization, Model, ModelStatus};
pub use report::{format_elapsed, ModelOutcome, RunOutcome, RunReport};
