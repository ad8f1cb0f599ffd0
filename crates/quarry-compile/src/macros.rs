//! Macro registry
//!
//! Named, parameterized SQL fragments. Definitions come from `.sql` files
//! under the macros directory, written as
//! `{% macro name(p1, p2) %} body {% endmacro %}` blocks. Expansion is
//! purely textual substitution; nested invocations resolve by re-scanning
//! the substituted text, bounded by a fixed pass limit so a self-referential
//! macro fails fast instead of looping forever.

use regex::Regex;
use std::collections::HashMap;
use std::path::Path;
use std::sync::OnceLock;
use walkdir::WalkDir;

use quarry_core::QuarryError;

use crate::scan::{scan, Argument, ScanError, Token};

/// Maximum scan-substitute passes before expansion is declared divergent.
pub const MAX_EXPANSION_PASSES: usize = 16;

fn macro_block_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(
            r"(?s)\{%\s*macro\s+([A-Za-z_][A-Za-z0-9_]*)\s*\(([^)]*)\)\s*%\}(.*?)\{%\s*endmacro\s*%\}",
        )
        .expect("macro block pattern")
    })
}

/// A single macro definition.
#[derive(Debug, Clone)]
pub struct MacroDef {
    pub name: String,
    pub params: Vec<String>,
    pub body: String,
}

/// Registry of uniquely named macros.
#[derive(Debug, Default)]
pub struct MacroRegistry {
    macros: HashMap<String, MacroDef>,
}

impl MacroRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.macros.len()
    }

    pub fn is_empty(&self) -> bool {
        self.macros.is_empty()
    }

    /// Register a macro. Redefinition is an error, not an override.
    pub fn define(
        &mut self,
        name: impl Into<String>,
        params: Vec<String>,
        body: impl Into<String>,
    ) -> Result<(), QuarryError> {
        let name = name.into();
        if self.macros.contains_key(&name) {
            return Err(QuarryError::DuplicateMacro { name });
        }
        self.macros.insert(
            name.clone(),
            MacroDef {
                name,
                params,
                body: body.into(),
            },
        );
        Ok(())
    }

    /// Load every macro block found in `.sql` files under `dir`. Returns the
    /// number of macros defined.
    pub fn load_dir(&mut self, dir: &Path) -> Result<usize, QuarryError> {
        let before = self.macros.len();
        for entry in WalkDir::new(dir).sort_by_file_name() {
            let entry = entry.map_err(|e| QuarryError::Io(e.into()))?;
            if !entry.file_type().is_file() {
                continue;
            }
            let path = entry.path();
            if path.extension().and_then(|e| e.to_str()) != Some("sql") {
                continue;
            }
            let source = std::fs::read_to_string(path)?;
            for captures in macro_block_re().captures_iter(&source) {
                let name = captures[1].to_string();
                let params = captures[2]
                    .split(',')
                    .map(|p| p.trim().to_string())
                    .filter(|p| !p.is_empty())
                    .collect();
                let body = captures[3].trim().to_string();
                tracing::debug!(name = %name, path = %path.display(), "defined macro");
                self.define(name, params, body)?;
            }
        }
        Ok(self.macros.len() - before)
    }

    /// Expand every macro invocation in `text`, recursing into substituted
    /// text until a fixed point is reached. `model` names the invocation
    /// site in errors.
    pub fn expand(&self, text: &str, model: &str) -> Result<String, QuarryError> {
        let mut current = text.to_string();
        for _ in 0..MAX_EXPANSION_PASSES {
            let (out, changed) = self.expand_once(&current, model)?;
            if !changed {
                return Ok(out);
            }
            current = out;
        }
        Err(QuarryError::MacroRecursionLimit {
            model: model.to_string(),
            limit: MAX_EXPANSION_PASSES,
        })
    }

    /// One scan-substitute pass. Returns the rebuilt text and whether any
    /// invocation was substituted.
    fn expand_once(&self, text: &str, model: &str) -> Result<(String, bool), QuarryError> {
        let tokens = scan(text).map_err(|e| scan_error(e, model))?;
        let mut out = String::with_capacity(text.len());
        let mut changed = false;
        for token in tokens {
            match token {
                Token::Text(s) => out.push_str(s),
                // reference markers pass through untouched; the graph
                // builder owns them
                Token::ModelReference { raw, .. } => out.push_str(raw),
                Token::Placeholder { name, .. } => {
                    // placeholders are only legal inside a macro body, where
                    // binding replaces them before splicing
                    return Err(QuarryError::UnknownMacro {
                        name,
                        model: model.to_string(),
                    });
                }
                Token::MacroInvocation { name, args, raw } => {
                    let def = self.macros.get(&name).ok_or_else(|| {
                        QuarryError::UnknownMacro {
                            name: name.clone(),
                            model: model.to_string(),
                        }
                    })?;
                    let bindings = bind_arguments(def, &args, model, raw)?;
                    out.push_str(&substitute_body(def, &bindings, model)?);
                    changed = true;
                }
            }
        }
        Ok((out, changed))
    }
}

fn scan_error(e: ScanError, model: &str) -> QuarryError {
    QuarryError::InvalidModelDefinition {
        path: model.to_string(),
        token: e.token(),
    }
}

/// Bind invocation arguments to the macro's parameters, positionally then
/// by name.
fn bind_arguments(
    def: &MacroDef,
    args: &[Argument],
    model: &str,
    raw: &str,
) -> Result<HashMap<String, String>, QuarryError> {
    let invalid = || QuarryError::InvalidModelDefinition {
        path: model.to_string(),
        token: raw.to_string(),
    };

    let mut bindings: HashMap<String, String> = HashMap::new();
    let mut positional = 0usize;
    let mut seen_named = false;
    for arg in args {
        match &arg.name {
            None => {
                if seen_named {
                    // positional after named
                    return Err(invalid());
                }
                let param = def.params.get(positional).ok_or_else(invalid)?;
                bindings.insert(param.clone(), arg.value.clone());
                positional += 1;
            }
            Some(name) => {
                seen_named = true;
                if !def.params.contains(name) || bindings.contains_key(name) {
                    return Err(invalid());
                }
                bindings.insert(name.clone(), arg.value.clone());
            }
        }
    }
    if bindings.len() != def.params.len() {
        return Err(invalid());
    }
    Ok(bindings)
}

/// Replace bound placeholders in the macro body. Nested invocations have
/// their arguments rebound where an argument names an outer parameter, so
/// bindings flow through macro composition. Unbound placeholders stay in
/// place and are reported on the next pass.
fn substitute_body(
    def: &MacroDef,
    bindings: &HashMap<String, String>,
    model: &str,
) -> Result<String, QuarryError> {
    let tokens = scan(&def.body).map_err(|e| scan_error(e, model))?;
    let mut out = String::with_capacity(def.body.len());
    for token in tokens {
        match token {
            Token::Text(s) => out.push_str(s),
            Token::Placeholder { ref name, raw } => match bindings.get(name) {
                Some(value) => out.push_str(value),
                None => out.push_str(raw),
            },
            Token::ModelReference { raw, .. } => out.push_str(raw),
            Token::MacroInvocation { name, args, .. } => {
                let rendered = args
                    .iter()
                    .map(|arg| {
                        let value = bindings
                            .get(arg.value.as_str())
                            .map(String::as_str)
                            .unwrap_or(arg.value.as_str());
                        match &arg.name {
                            Some(n) => format!("{}='{}'", n, value),
                            None => format!("'{}'", value),
                        }
                    })
                    .collect::<Vec<_>>()
                    .join(", ");
                out.push_str(&format!("{{{{ {}({}) }}}}", name, rendered));
            }
        }
    }
    Ok(out)
}
