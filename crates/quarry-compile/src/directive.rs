//! Materialization directive
//!
//! A model may declare its materialization kind with a leading comment,
//! before the first non-comment line:
//!
//! ```sql
//! -- materialize: view
//! select ...
//! ```
//!
//! Absence implies TABLE. A malformed value aborts the whole run; silently
//! defaulting could corrupt a downstream table/view choice.

use std::path::Path;

use quarry_core::{Materialization, QuarryError};

const DIRECTIVE_KEY: &str = "materialize:";

/// Parse the materialization directive from the leading comments of a model
/// file, if present.
pub fn parse_materialization(text: &str, path: &Path) -> Result<Materialization, QuarryError> {
    for line in text.lines() {
        let trimmed = line.trim();
        if trimmed.is_empty() {
            continue;
        }
        let Some(comment) = trimmed.strip_prefix("--") else {
            // first non-comment line ends the directive window
            break;
        };
        let comment = comment.trim();
        if !comment.to_ascii_lowercase().starts_with(DIRECTIVE_KEY) {
            continue;
        }
        let value = comment[DIRECTIVE_KEY.len()..].trim();
        return match value.to_ascii_lowercase().as_str() {
            "table" => Ok(Materialization::Table),
            "view" => Ok(Materialization::View),
            _ => Err(QuarryError::InvalidModelDefinition {
                path: path.display().to_string(),
                token: trimmed.to_string(),
            }),
        };
    }
    Ok(Materialization::default())
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::path::PathBuf;

    fn parse(text: &str) -> Result<Materialization, QuarryError> {
        parse_materialization(text, &PathBuf::from("models/m.sql"))
    }

    #[test]
    fn absence_defaults_to_table() {
        assert_eq!(parse("select 1").unwrap(), Materialization::Table);
    }

    #[test]
    fn view_directive() {
        assert_eq!(
            parse("-- materialize: view\nselect 1").unwrap(),
            Materialization::View
        );
    }

    #[test]
    fn case_insensitive() {
        assert_eq!(
            parse("--   MATERIALIZE: TABLE\nselect 1").unwrap(),
            Materialization::Table
        );
    }

    #[test]
    fn directive_after_ordinary_comments() {
        let text = "-- staging model\n-- materialize: view\nselect 1";
        assert_eq!(parse(text).unwrap(), Materialization::View);
    }

    #[test]
    fn directive_after_sql_is_ignored() {
        let text = "select 1\n-- materialize: view";
        assert_eq!(parse(text).unwrap(), Materialization::Table);
    }

    #[test]
    fn malformed_value_names_file_and_token() {
        let err = parse("-- materialize: incremental\nselect 1").unwrap_err();
        match err {
            QuarryError::InvalidModelDefinition { path, token } => {
                assert_eq!(path, "models/m.sql");
                assert_eq!(token, "-- materialize: incremental");
            }
            other => panic!("unexpected error: {other}"),
        }
    }
}
