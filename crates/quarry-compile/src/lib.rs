//! Quarry Compile
//!
//! The compilation front end: the template token scanner, the macro
//! registry, the materialization-directive parser, and the model loader.
//! Everything here is purely textual; no SQL is parsed or type checked.

pub mod directive;
pub mod loader;
pub mod macros;
pub mod scan;

pub use directive::parse_materialization;
pub use loader::load_models;
pub use macros::{MacroDef, MacroRegistry, MAX_EXPANSION_PASSES};
pub use scan::{extract_refs, rewrite_refs, scan, Argument, ScanError, Token};
