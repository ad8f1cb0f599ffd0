//! Quarry Graph
//!
//! Dependency-graph construction, cycle detection, topological stage
//! planning, and the SVG visualizer. The graph and plan are derived fresh
//! every run and discarded afterwards; nothing here persists.

pub mod graph;
pub mod plan;
pub mod viz;

pub use graph::DependencyGraph;
pub use plan::{plan, ExecutionPlan};
pub use viz::{render_svg, to_dot, write_svg, VizError};
