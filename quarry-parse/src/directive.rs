//! Directive comment scanning.
//!
//! Directives are structured comments of the form
//! `//namespace:kind [key=value ...]` attached to the declaration that
//! immediately follows them. Tokens keep their exact column offsets so
//! diagnostics can anchor on a single token (e.g. the `raw` flag).
//!
//! Comments that do not begin with the recognized namespace are never
//! directive candidates: they are ignored entirely rather than reported as
//! malformed. Only a comment starting `//namespace:` can produce a
//! directive-syntax error.

use quarry_core::Span;

/// One space-separated directive token, `key` or `key=value`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DirectiveToken {
    /// Token key (the whole token for bare flags).
    pub key: String,
    /// Value for `key=value` tokens.
    pub value: Option<String>,
    /// Exact source range of the token.
    pub span: Span,
}

/// A parsed directive comment.
#[derive(Debug, Clone)]
pub struct Directive {
    /// Directive kind, e.g. `api` in `//quarry:api`.
    pub kind: String,
    /// First bare token, when present (e.g. `public` in `//quarry:api public`).
    pub subkind: Option<String>,
    /// All tokens following the kind, in order.
    pub tokens: Vec<DirectiveToken>,
    /// Source range of the whole comment.
    pub span: Span,
}

impl Directive {
    /// Value of a `key=value` token.
    pub fn get(&self, key: &str) -> Option<&str> {
        self.tokens
            .iter()
            .find(|t| t.key == key && t.value.is_some())
            .and_then(|t| t.value.as_deref())
    }

    /// Span of a `key=value` token's value.
    pub fn value_span(&self, key: &str) -> Option<Span> {
        let token = self
            .tokens
            .iter()
            .find(|t| t.key == key && t.value.is_some())?;
        let start = token.span.start + key.len() + 1;
        Some(Span::new(token.span.path.clone(), start, token.span.end))
    }

    /// Returns true if a bare flag token is present.
    pub fn has_flag(&self, name: &str) -> bool {
        self.tokens
            .iter()
            .any(|t| t.key == name && t.value.is_none())
    }

    /// Span of a bare flag token.
    pub fn flag_span(&self, name: &str) -> Option<Span> {
        self.tokens
            .iter()
            .find(|t| t.key == name && t.value.is_none())
            .map(|t| t.span.clone())
    }
}

/// A directive-syntax problem, reported with the offending span.
#[derive(Debug, Clone)]
pub struct DirectiveIssue {
    pub message: String,
    pub span: Span,
}

/// Result of inspecting one comment line.
pub enum CommentLine {
    /// Not a directive candidate: an ordinary comment.
    Plain,
    /// A well-formed directive.
    Directive(Directive),
    /// A namespace comment that fails the directive grammar.
    Malformed(DirectiveIssue),
}

/// Inspect a comment line.
///
/// `line` is the full line text; `line_start` its byte offset in the file.
/// The line must already be known to be a `//` comment.
pub fn parse_comment(namespace: &str, path: &str, line: &str, line_start: usize) -> CommentLine {
    let trimmed = line.trim_start();
    let indent = line.len() - trimmed.len();
    let Some(content) = trimmed.strip_prefix("//") else {
        return CommentLine::Plain;
    };

    let prefix = format!("{namespace}:");
    if !content.starts_with(&prefix) {
        return CommentLine::Plain;
    }

    // Offset of `content` past the namespace prefix, within the file.
    let base = line_start + indent + 2 + prefix.len();
    let rest = &content[prefix.len()..];
    let comment_end = line_start + indent + 2 + content.trim_end().len();
    let comment_span = Span::new(path, line_start + indent, comment_end);

    let kind: String = rest
        .chars()
        .take_while(|c| !c.is_whitespace())
        .collect();
    if kind.is_empty() || !is_ident(&kind) {
        return CommentLine::Malformed(DirectiveIssue {
            message: format!("missing or invalid directive kind after '//{prefix}'"),
            span: comment_span,
        });
    }

    let mut tokens = Vec::new();
    let mut subkind = None;
    let body = &rest[kind.len()..];
    let body_base = base + kind.len();

    for (offset, raw) in split_tokens(body) {
        let span = Span::new(path, body_base + offset, body_base + offset + raw.len());
        match raw.split_once('=') {
            Some((key, value)) => {
                if key.is_empty() || !is_ident(key) {
                    return CommentLine::Malformed(DirectiveIssue {
                        message: format!("invalid directive option '{raw}'"),
                        span,
                    });
                }
                if value.is_empty() {
                    return CommentLine::Malformed(DirectiveIssue {
                        message: format!("directive option '{key}' is missing a value"),
                        span,
                    });
                }
                tokens.push(DirectiveToken {
                    key: key.to_string(),
                    value: Some(value.to_string()),
                    span,
                });
            }
            None => {
                if !is_ident(raw) {
                    return CommentLine::Malformed(DirectiveIssue {
                        message: format!("invalid directive token '{raw}'"),
                        span,
                    });
                }
                if subkind.is_none() {
                    subkind = Some(raw.to_string());
                }
                tokens.push(DirectiveToken {
                    key: raw.to_string(),
                    value: None,
                    span,
                });
            }
        }
    }

    CommentLine::Directive(Directive {
        kind,
        subkind,
        tokens,
        span: comment_span,
    })
}

/// Split on ASCII whitespace, yielding `(byte_offset, token)` pairs.
fn split_tokens(body: &str) -> Vec<(usize, &str)> {
    let mut out = Vec::new();
    let mut start = None;
    for (i, c) in body.char_indices() {
        if c.is_whitespace() {
            if let Some(s) = start.take() {
                out.push((s, &body[s..i]));
            }
        } else if start.is_none() {
            start = Some(i);
        }
    }
    if let Some(s) = start {
        out.push((s, body[s..].trim_end()));
    }
    out
}

fn is_ident(s: &str) -> bool {
    !s.is_empty()
        && s.chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-')
}
