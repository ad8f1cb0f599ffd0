//! Quarry Engine
//!
//! The query-engine boundary and the stage executor. The orchestration core
//! depends on a single operation, `QueryEngine::execute`; the DuckDB adapter
//! and the in-memory mock both live behind it.

pub mod duckdb;
pub mod engine;
pub mod executor;
pub mod mock;

pub use crate::duckdb::DuckDbEngine;
pub use engine::{EngineError, EngineMeta, QueryEngine};
pub use executor::{materialize_sql, Executor};
pub use mock::MockEngine;
