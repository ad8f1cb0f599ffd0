//! Error taxonomy
//!
//! Structural errors (anything other than `Io`) are fatal to the whole run:
//! they indicate a defect in the model tree and are reported before any
//! execution begins. Engine failures during execution are carried per model
//! in the run report instead, so they never appear here.

/// Errors raised while loading, compiling, or planning a model tree.
#[derive(Debug, thiserror::Error)]
pub enum QuarryError {
    #[error("invalid model definition in {path}: `{token}`")]
    InvalidModelDefinition { path: String, token: String },

    #[error("macro `{name}` is already defined; redefinition is not allowed")]
    DuplicateMacro { name: String },

    #[error("unknown macro `{name}` invoked from `{model}`")]
    UnknownMacro { name: String, model: String },

    #[error("macro expansion of `{model}` did not settle after {limit} passes; a macro likely invokes itself")]
    MacroRecursionLimit { model: String, limit: usize },

    #[error("model `{model}` references `{reference}`, which does not exist")]
    UnresolvedReference { model: String, reference: String },

    #[error("cyclic dependency: {}", cycle.join(" -> "))]
    CyclicDependency { cycle: Vec<String> },

    #[error("scheduling invariant violated: {0}")]
    Scheduling(String),

    #[error("configuration error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cycle_error_lists_the_full_cycle() {
        let err = QuarryError::CyclicDependency {
            cycle: vec!["a".into(), "b".into(), "a".into()],
        };
        assert_eq!(err.to_string(), "cyclic dependency: a -> b -> a");
    }

    #[test]
    fn unresolved_reference_names_both_sides() {
        let err = QuarryError::UnresolvedReference {
            model: "x".into(),
            reference: "y".into(),
        };
        let msg = err.to_string();
        assert!(msg.contains("`x`"));
        assert!(msg.contains("`y`"));
    }
}
