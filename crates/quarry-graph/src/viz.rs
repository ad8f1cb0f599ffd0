//! Graph visualizer
//!
//! Converts the dependency graph into a DOT document and renders it to SVG
//! through the `layout` crate. Edges are drawn dependency -> dependent, the
//! direction rows flow through the pipeline. No execution side effects.

use std::path::Path;

use layout::{
    backends::svg::SVGWriter,
    gv::{self, GraphBuilder},
};

use quarry_core::Model;

use crate::graph::DependencyGraph;

/// Rendering failure. Kept separate from the pipeline taxonomy; a broken
/// diagram never affects execution.
#[derive(Debug, thiserror::Error)]
pub enum VizError {
    #[error("DOT parse error: {0}")]
    Dot(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Emit the logical node/edge model as DOT. `models` must be the slice the
/// graph was built from; node `i` is labeled with `models[i]`'s identity and
/// materialization kind.
pub fn to_dot(graph: &DependencyGraph, models: &[Model]) -> String {
    let mut nodes = Vec::with_capacity(graph.len());
    for model in models {
        nodes.push(format!(
            "    \"{}\" [label=\"{}\\n({})\"];",
            model.identity, model.identity, model.materialization
        ));
    }

    let mut edges = Vec::new();
    for node in 0..graph.len() {
        for &dependent in graph.dependents(node) {
            edges.push(format!(
                "    \"{}\" -> \"{}\";",
                graph.identity(node),
                graph.identity(dependent)
            ));
        }
    }

    format!(
        "digraph quarry {{\n{}\n{}\n}}\n",
        nodes.join("\n"),
        edges.join("\n")
    )
}

/// Render the dependency graph to an SVG document.
pub fn render_svg(graph: &DependencyGraph, models: &[Model]) -> Result<String, VizError> {
    let dot = to_dot(graph, models);
    let mut parser = gv::DotParser::new(&dot);
    let parsed = parser.process().map_err(VizError::Dot)?;

    let mut builder = GraphBuilder::new();
    builder.visit_graph(&parsed);
    let mut visual = builder.get();
    let mut writer = SVGWriter::new();
    visual.do_it(false, false, false, &mut writer);
    Ok(writer.finalize())
}

/// Render and write the SVG artifact to `path`.
pub fn write_svg(graph: &DependencyGraph, models: &[Model], path: &Path) -> Result<(), VizError> {
    let svg = render_svg(graph, models)?;
    std::fs::write(path, svg)?;
    tracing::info!(path = %path.display(), "wrote dependency diagram");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::test_support::models;

    fn diamond() -> (DependencyGraph, Vec<Model>) {
        let mut set = models(&[
            ("a", "select 1"),
            ("b", "select * from {{ ref('a') }}"),
            ("c", "select * from {{ ref('a') }}"),
        ]);
        set[1].materialization = quarry_core::Materialization::View;
        let graph = DependencyGraph::build(&mut set).unwrap();
        (graph, set)
    }

    #[test]
    fn dot_labels_carry_materialization() {
        let (graph, set) = diamond();
        let dot = to_dot(&graph, &set);
        assert!(dot.contains("\"a\" [label=\"a\\n(table)\"];"));
        assert!(dot.contains("\"b\" [label=\"b\\n(view)\"];"));
    }

    #[test]
    fn edges_point_from_dependency_to_dependent() {
        let (graph, set) = diamond();
        let dot = to_dot(&graph, &set);
        assert!(dot.contains("\"a\" -> \"b\";"));
        assert!(dot.contains("\"a\" -> \"c\";"));
        assert!(!dot.contains("\"b\" -> \"a\";"));
    }

    #[test]
    fn renders_svg_document() {
        let (graph, set) = diamond();
        let svg = render_svg(&graph, &set).unwrap();
        assert!(svg.contains("<svg"));
        assert!(svg.contains("</svg>"));
    }

    #[test]
    fn writes_svg_artifact() {
        let (graph, set) = diamond();
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("graph.svg");
        write_svg(&graph, &set, &path).unwrap();
        assert!(std::fs::read_to_string(&path).unwrap().contains("<svg"));
    }
}
