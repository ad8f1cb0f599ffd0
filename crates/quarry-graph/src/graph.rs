//! Dependency graph
//!
//! Models live in an arena indexed by a stable integer id assigned at build
//! time, with edges stored as index pairs. This avoids identity-based
//! ownership cycles between model objects during cycle detection.

use std::collections::{HashMap, HashSet, VecDeque};

use quarry_core::{Model, QuarryError};
use quarry_compile::{extract_refs, ScanError};

#[derive(Debug, Clone)]
struct GraphNode {
    identity: String,
    /// Models this node depends on (must run earlier)
    dependencies: Vec<usize>,
    /// Models that depend on this node (run later)
    dependents: Vec<usize>,
}

/// Directed "depends-on" graph over a set of models.
///
/// Node index `i` corresponds to `models[i]` of the slice the graph was
/// built from (the loader returns models sorted by identity, so indices are
/// stable for a given model tree).
#[derive(Debug, Clone)]
pub struct DependencyGraph {
    nodes: Vec<GraphNode>,
    index: HashMap<String, usize>,
}

impl DependencyGraph {
    /// Build the graph by scanning every model's expanded text for reference
    /// markers. Fills each model's derived `dependencies` set. Fails on
    /// references to unknown identities and on cycles; both are defects in
    /// the model tree, never tolerated as warnings.
    pub fn build(models: &mut [Model]) -> Result<Self, QuarryError> {
        let index: HashMap<String, usize> = models
            .iter()
            .enumerate()
            .map(|(i, m)| (m.identity.clone(), i))
            .collect();
        let mut nodes: Vec<GraphNode> = models
            .iter()
            .map(|m| GraphNode {
                identity: m.identity.clone(),
                dependencies: Vec::new(),
                dependents: Vec::new(),
            })
            .collect();

        for (i, model) in models.iter_mut().enumerate() {
            let refs = extract_refs(&model.expanded_text)
                .map_err(|e| scan_error(e, model))?;
            let mut seen = HashSet::new();
            for target in refs {
                let &dep = index.get(&target).ok_or_else(|| {
                    QuarryError::UnresolvedReference {
                        model: model.identity.clone(),
                        reference: target.clone(),
                    }
                })?;
                model.dependencies.insert(target);
                if seen.insert(dep) {
                    nodes[i].dependencies.push(dep);
                }
            }
        }
        for i in 0..nodes.len() {
            for j in 0..nodes[i].dependencies.len() {
                let dep = nodes[i].dependencies[j];
                nodes[dep].dependents.push(i);
            }
        }

        let graph = Self { nodes, index };
        graph.check_acyclic()?;
        tracing::debug!(
            nodes = graph.len(),
            edges = graph.nodes.iter().map(|n| n.dependencies.len()).sum::<usize>(),
            "dependency graph built"
        );
        Ok(graph)
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn identity(&self, node: usize) -> &str {
        &self.nodes[node].identity
    }

    pub fn index_of(&self, identity: &str) -> Option<usize> {
        self.index.get(identity).copied()
    }

    /// Immediate dependencies of a node (models that must run earlier).
    pub fn dependencies(&self, node: usize) -> &[usize] {
        &self.nodes[node].dependencies
    }

    /// Immediate dependents of a node (models that run later).
    pub fn dependents(&self, node: usize) -> &[usize] {
        &self.nodes[node].dependents
    }

    /// Transitive closure of dependents: every model affected if `node`
    /// fails.
    pub fn downstream(&self, node: usize) -> Vec<usize> {
        let mut visited = HashSet::new();
        let mut queue: VecDeque<usize> = self.nodes[node].dependents.iter().copied().collect();
        let mut result = Vec::new();

        while let Some(current) = queue.pop_front() {
            if !visited.insert(current) {
                continue;
            }
            result.push(current);
            for &dependent in &self.nodes[current].dependents {
                if !visited.contains(&dependent) {
                    queue.push_back(dependent);
                }
            }
        }
        result
    }

    /// Depth-first cycle detection with three-color marking. The error
    /// enumerates the full cycle in edge order, closing on its start.
    fn check_acyclic(&self) -> Result<(), QuarryError> {
        #[derive(Clone, Copy, PartialEq)]
        enum Color {
            White,
            Gray,
            Black,
        }
        let mut color = vec![Color::White; self.nodes.len()];

        for start in 0..self.nodes.len() {
            if color[start] != Color::White {
                continue;
            }
            // frames hold (node, next dependency edge to explore)
            let mut stack: Vec<(usize, usize)> = vec![(start, 0)];
            color[start] = Color::Gray;

            while let Some(frame) = stack.last_mut() {
                let (node, edge) = *frame;
                if edge < self.nodes[node].dependencies.len() {
                    frame.1 += 1;
                    let dep = self.nodes[node].dependencies[edge];
                    match color[dep] {
                        Color::White => {
                            color[dep] = Color::Gray;
                            stack.push((dep, 0));
                        }
                        Color::Gray => {
                            let from = stack
                                .iter()
                                .position(|&(n, _)| n == dep)
                                .unwrap_or(0);
                            let mut cycle: Vec<String> = stack[from..]
                                .iter()
                                .map(|&(n, _)| self.nodes[n].identity.clone())
                                .collect();
                            cycle.push(self.nodes[dep].identity.clone());
                            return Err(QuarryError::CyclicDependency { cycle });
                        }
                        Color::Black => {}
                    }
                } else {
                    color[node] = Color::Black;
                    stack.pop();
                }
            }
        }
        Ok(())
    }
}

fn scan_error(e: ScanError, model: &Model) -> QuarryError {
    QuarryError::InvalidModelDefinition {
        path: model.source_path.display().to_string(),
        token: e.token(),
    }
}

#[cfg(test)]
pub(crate) mod test_support {
    use quarry_core::{Materialization, Model, ModelStatus};
    use std::path::PathBuf;

    /// Build a model set from `(identity, sql)` pairs, sorted by identity
    /// the way the loader returns them.
    pub fn models(defs: &[(&str, &str)]) -> Vec<Model> {
        let mut models: Vec<Model> = defs
            .iter()
            .map(|(identity, sql)| Model {
                identity: identity.to_string(),
                source_path: PathBuf::from(format!("models/{}.sql", identity.replace('.', "/"))),
                materialization: Materialization::Table,
                raw_text: sql.to_string(),
                expanded_text: sql.to_string(),
                dependencies: Default::default(),
                status: ModelStatus::Pending,
            })
            .collect();
        models.sort_by(|a, b| a.identity.cmp(&b.identity));
        models
    }
}
