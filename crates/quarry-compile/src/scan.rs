//! Template token scanner
//!
//! Splits free SQL text into a typed token stream instead of doing ad-hoc
//! string search, so macro resolution and reference extraction stay
//! composable and testable in isolation. Markers are `{{ ... }}` spans:
//!
//! - `{{ ref('other.model') }}`     — a model reference
//! - `{{ name(arg, key=value) }}`   — a macro invocation
//! - `{{ name }}`                   — a parameter placeholder

use std::fmt;

/// One argument of a macro invocation, positional or named.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Argument {
    pub name: Option<String>,
    pub value: String,
}

/// A scanned span of template text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Token<'a> {
    /// Plain text between markers, passed through verbatim
    Text(&'a str),

    /// `{{ ref('target') }}`
    ModelReference { target: String, raw: &'a str },

    /// `{{ name(args...) }}` for any name other than `ref`
    MacroInvocation {
        name: String,
        args: Vec<Argument>,
        raw: &'a str,
    },

    /// `{{ name }}` with no argument list
    Placeholder { name: String, raw: &'a str },
}

/// Scanner failure, converted by callers into `InvalidModelDefinition`
/// with the offending file attached.
#[derive(Debug, Clone, thiserror::Error)]
pub enum ScanError {
    #[error("unterminated `{{{{` marker")]
    Unterminated,

    #[error("malformed marker `{raw}`")]
    Malformed { raw: String },
}

impl ScanError {
    /// The token text to report, best effort.
    pub fn token(&self) -> String {
        match self {
            ScanError::Unterminated => "{{".to_string(),
            ScanError::Malformed { raw } => raw.clone(),
        }
    }
}

fn is_identifier(s: &str) -> bool {
    let mut chars = s.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() || c == '_' => {}
        _ => return false,
    }
    chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}

/// Strip one level of matching quotes, if present.
fn unquote(s: &str) -> &str {
    let bytes = s.as_bytes();
    if s.len() >= 2
        && (bytes[0] == b'\'' || bytes[0] == b'"')
        && bytes[s.len() - 1] == bytes[0]
    {
        &s[1..s.len() - 1]
    } else {
        s
    }
}

/// Split an argument list at top-level commas, respecting quotes.
fn split_args(inner: &str) -> Vec<&str> {
    let mut parts = Vec::new();
    let mut start = 0;
    let mut quote: Option<char> = None;
    for (i, c) in inner.char_indices() {
        match quote {
            Some(q) => {
                if c == q {
                    quote = None;
                }
            }
            None => match c {
                '\'' | '"' => quote = Some(c),
                ',' => {
                    parts.push(&inner[start..i]);
                    start = i + 1;
                }
                _ => {}
            },
        }
    }
    parts.push(&inner[start..]);
    parts
}

fn parse_argument(raw: &str) -> Result<Argument, ScanError> {
    let raw = raw.trim();
    if raw.is_empty() {
        return Err(ScanError::Malformed { raw: raw.into() });
    }
    if let Some(eq) = raw.find('=') {
        let name = raw[..eq].trim();
        if is_identifier(name) {
            let value = unquote(raw[eq + 1..].trim()).to_string();
            return Ok(Argument {
                name: Some(name.to_string()),
                value,
            });
        }
    }
    Ok(Argument {
        name: None,
        value: unquote(raw).to_string(),
    })
}

/// Parse the interior of a `{{ ... }}` marker.
fn parse_marker<'a>(inner: &str, raw: &'a str) -> Result<Token<'a>, ScanError> {
    let inner = inner.trim();
    if is_identifier(inner) {
        return Ok(Token::Placeholder {
            name: inner.to_string(),
            raw,
        });
    }

    let malformed = || ScanError::Malformed {
        raw: raw.to_string(),
    };

    let open = inner.find('(').ok_or_else(malformed)?;
    let name = inner[..open].trim();
    if !is_identifier(name) || !inner.ends_with(')') {
        return Err(malformed());
    }
    let arg_text = &inner[open + 1..inner.len() - 1];
    let args = if arg_text.trim().is_empty() {
        Vec::new()
    } else {
        split_args(arg_text)
            .into_iter()
            .map(parse_argument)
            .collect::<Result<Vec<_>, _>>()?
    };

    if name == "ref" {
        // exactly one positional argument names the target model
        match args.as_slice() {
            [Argument { name: None, value }] if !value.is_empty() => Ok(Token::ModelReference {
                target: value.clone(),
                raw,
            }),
            _ => Err(malformed()),
        }
    } else {
        Ok(Token::MacroInvocation {
            name: name.to_string(),
            args,
            raw,
        })
    }
}

/// Scan template text into a token stream.
pub fn scan(text: &str) -> Result<Vec<Token<'_>>, ScanError> {
    let mut tokens = Vec::new();
    let mut rest = text;
    let mut offset = 0;

    while let Some(open) = rest.find("{{") {
        if open > 0 {
            tokens.push(Token::Text(&text[offset..offset + open]));
        }
        let after = &rest[open + 2..];
        let close = after.find("}}").ok_or(ScanError::Unterminated)?;
        let raw = &text[offset + open..offset + open + 2 + close + 2];
        tokens.push(parse_marker(&after[..close], raw)?);
        offset += open + 2 + close + 2;
        rest = &text[offset..];
    }
    if !rest.is_empty() {
        tokens.push(Token::Text(rest));
    }
    Ok(tokens)
}

/// Collect the targets of every model reference in `text`, in order of
/// appearance.
pub fn extract_refs(text: &str) -> Result<Vec<String>, ScanError> {
    Ok(scan(text)?
        .into_iter()
        .filter_map(|t| match t {
            Token::ModelReference { target, .. } => Some(target),
            _ => None,
        })
        .collect())
}

/// Rebuild `text` with every model-reference marker replaced by
/// `resolve(target)`; all other tokens pass through verbatim.
pub fn rewrite_refs(
    text: &str,
    mut resolve: impl FnMut(&str) -> String,
) -> Result<String, ScanError> {
    let mut out = String::with_capacity(text.len());
    for token in scan(text)? {
        match token {
            Token::Text(s) => out.push_str(s),
            Token::ModelReference { target, .. } => out.push_str(&resolve(&target)),
            Token::MacroInvocation { raw, .. } | Token::Placeholder { raw, .. } => {
                out.push_str(raw)
            }
        }
    }
    Ok(out)
}

impl fmt::Display for Argument {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.name {
            Some(name) => write!(f, "{}={}", name, self.value),
            None => write!(f, "{}", self.value),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn plain_text_only() {
        let tokens = scan("select 1").unwrap();
        assert_eq!(tokens, vec![Token::Text("select 1")]);
    }

    #[test]
    fn model_reference() {
        let tokens = scan("select * from {{ ref('staging.users') }}").unwrap();
        assert_eq!(
            tokens,
            vec![
                Token::Text("select * from "),
                Token::ModelReference {
                    target: "staging.users".into(),
                    raw: "{{ ref('staging.users') }}",
                },
            ]
        );
    }

    #[test]
    fn macro_invocation_with_named_args() {
        let tokens = scan("{{ money(amount, currency='usd') }}").unwrap();
        match &tokens[0] {
            Token::MacroInvocation { name, args, .. } => {
                assert_eq!(name, "money");
                assert_eq!(
                    args,
                    &vec![
                        Argument {
                            name: None,
                            value: "amount".into()
                        },
                        Argument {
                            name: Some("currency".into()),
                            value: "usd".into()
                        },
                    ]
                );
            }
            other => panic!("expected invocation, got {:?}", other),
        }
    }

    #[test]
    fn bare_placeholder() {
        let tokens = scan("{{ amount }}").unwrap();
        assert_eq!(
            tokens,
            vec![Token::Placeholder {
                name: "amount".into(),
                raw: "{{ amount }}",
            }]
        );
    }

    #[test]
    fn quoted_comma_does_not_split_args() {
        let tokens = scan("{{ fmt('a,b', x) }}").unwrap();
        match &tokens[0] {
            Token::MacroInvocation { args, .. } => {
                assert_eq!(args[0].value, "a,b");
                assert_eq!(args[1].value, "x");
            }
            other => panic!("expected invocation, got {:?}", other),
        }
    }

    #[test]
    fn unterminated_marker() {
        assert!(matches!(scan("select {{ ref('x')"), Err(ScanError::Unterminated)));
    }

    #[test]
    fn ref_requires_one_positional_argument() {
        assert!(scan("{{ ref() }}").is_err());
        assert!(scan("{{ ref('a', 'b') }}").is_err());
        assert!(scan("{{ ref(target='a') }}").is_err());
    }

    #[test]
    fn malformed_marker() {
        let err = scan("{{ 1 + 2 }}").unwrap_err();
        assert!(err.token().contains("1 + 2"));
    }

    #[test]
    fn extract_refs_in_order() {
        let refs = extract_refs("{{ ref('b') }} x {{ ref('a') }} {{ ref('b') }}").unwrap();
        assert_eq!(refs, vec!["b", "a", "b"]);
    }

    #[test]
    fn rewrite_refs_leaves_other_tokens() {
        let out = rewrite_refs(
            "select * from {{ ref('a') }} -- {{ note }}",
            |t| format!("\"{}\"", t),
        )
        .unwrap();
        assert_eq!(out, "select * from \"a\" -- {{ note }}");
    }
}
