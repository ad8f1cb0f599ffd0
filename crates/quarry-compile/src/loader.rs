//! Model loader
//!
//! Walks the models directory, reads each SQL unit, parses its
//! materialization directive, and expands macros. Subdirectories are purely
//! organizational; they only affect identity through the relative path.

use std::path::Path;
use walkdir::WalkDir;

use quarry_core::{Model, ModelStatus, QuarryError};

use crate::directive::parse_materialization;
use crate::macros::MacroRegistry;

/// Derive a model identity from its path relative to the models root:
/// extension stripped, components joined with `.`. Unique by construction
/// since paths are unique.
fn identity_for(root: &Path, path: &Path) -> String {
    let relative = path.strip_prefix(root).unwrap_or(path);
    relative
        .with_extension("")
        .components()
        .map(|c| c.as_os_str().to_string_lossy().into_owned())
        .collect::<Vec<_>>()
        .join(".")
}

/// Discover every model under `root`, returned sorted by identity. Files
/// without a `.sql` extension are skipped. Any structural error (malformed
/// directive, macro failure) aborts the whole load.
pub fn load_models(root: &Path, registry: &MacroRegistry) -> Result<Vec<Model>, QuarryError> {
    let mut models = Vec::new();
    for entry in WalkDir::new(root).sort_by_file_name() {
        let entry = entry.map_err(|e| QuarryError::Io(e.into()))?;
        if !entry.file_type().is_file() {
            continue;
        }
        let path = entry.path();
        if path.extension().and_then(|e| e.to_str()) != Some("sql") {
            continue;
        }

        let identity = identity_for(root, path);
        let raw_text = std::fs::read_to_string(path)?;
        let materialization = parse_materialization(&raw_text, path)?;
        let expanded_text = registry.expand(&raw_text, &identity)?;
        tracing::debug!(model = %identity, path = %path.display(), %materialization, "loaded model");

        models.push(Model {
            identity,
            source_path: path.to_path_buf(),
            materialization,
            raw_text,
            expanded_text,
            dependencies: Default::default(),
            status: ModelStatus::Pending,
        });
    }
    models.sort_by(|a, b| a.identity.cmp(&b.identity));
    tracing::info!(count = models.len(), root = %root.display(), "discovered models");
    Ok(models)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use quarry_core::Materialization;

    fn write(root: &Path, rel: &str, contents: &str) {
        let path = root.join(rel);
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(path, contents).unwrap();
    }

    #[test]
    fn discovers_recursively_and_sorts_by_identity() {
        let dir = tempfile::tempdir().unwrap();
        write(dir.path(), "staging/users.sql", "select 1");
        write(dir.path(), "orders.sql", "select * from {{ ref('staging.users') }}");
        write(dir.path(), "staging/events.sql", "-- materialize: view\nselect 2");
        write(dir.path(), "notes.md", "not a model");

        let models = load_models(dir.path(), &MacroRegistry::new()).unwrap();
        let identities: Vec<_> = models.iter().map(|m| m.identity.as_str()).collect();
        assert_eq!(identities, vec!["orders", "staging.events", "staging.users"]);
        assert_eq!(models[1].materialization, Materialization::View);
        assert_eq!(models[2].materialization, Materialization::Table);
        assert!(models[0].expanded_text.contains("{{ ref('staging.users') }}"));
    }

    #[test]
    fn expands_macros_at_load_time() {
        let dir = tempfile::tempdir().unwrap();
        write(dir.path(), "m.sql", "select {{ cents(amount) }} from t");

        let mut registry = MacroRegistry::new();
        registry
            .define("cents", vec!["col".into()], "round({{ col }} * 100)")
            .unwrap();

        let models = load_models(dir.path(), &registry).unwrap();
        assert_eq!(models[0].expanded_text, "select round(amount * 100) from t");
        assert_eq!(models[0].raw_text, "select {{ cents(amount) }} from t");
    }

    #[test]
    fn malformed_directive_aborts_the_load() {
        let dir = tempfile::tempdir().unwrap();
        write(dir.path(), "good.sql", "select 1");
        write(dir.path(), "bad.sql", "-- materialize: rocket\nselect 1");

        let err = load_models(dir.path(), &MacroRegistry::new()).unwrap_err();
        assert!(matches!(err, QuarryError::InvalidModelDefinition { .. }));
    }

    #[test]
    fn unknown_macro_aborts_and_names_the_model() {
        let dir = tempfile::tempdir().unwrap();
        write(dir.path(), "deep/model.sql", "select {{ missing() }}");

        let err = load_models(dir.path(), &MacroRegistry::new()).unwrap_err();
        match err {
            QuarryError::UnknownMacro { name, model } => {
                assert_eq!(name, "missing");
                assert_eq!(model, "deep.model");
            }
            other => panic!("unexpected error: {other}"),
        }
    }
}
