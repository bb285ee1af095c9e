//! Annotated-declaration scanning.
//!
//! The discovery engine does not depend on a full host-language parser; it
//! consumes a generic "annotated declaration" model: package-level function
//! and variable declarations with their attached comment directives, plus
//! the call expressions found inside function bodies. This module produces
//! that model from the canonical `.qy` surface syntax with a line-oriented
//! scanner. A real language front end would produce the same model.
//!
//! The scanner never fails: malformed lines are treated as opaque
//! statements and resource parsers decide what to report.

use quarry_core::Span;

use crate::directive::{CommentLine, Directive, DirectiveIssue, parse_comment};

/// A function parameter.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Param {
    pub name: String,
    /// Type name with any leading `*` stripped.
    pub ty: String,
    /// True for pointer parameters (`*Request`).
    pub pointer: bool,
    pub span: Span,
}

/// A package-level function declaration.
#[derive(Debug, Clone)]
pub struct FuncDecl {
    pub name: String,
    pub name_span: Span,
    pub params: Vec<Param>,
    /// Span from the opening to the closing parenthesis of the parameter
    /// list, inclusive.
    pub params_span: Span,
    /// Result types as written, e.g. `["*Response", "error"]`.
    pub results: Vec<String>,
    pub span: Span,
}

/// A package-level variable declaration.
#[derive(Debug, Clone)]
pub struct VarDecl {
    pub name: String,
    pub name_span: Span,
    /// The initializer, when it is a single call expression.
    pub init: Option<CallExpr>,
    pub span: Span,
}

/// A literal or bare-word argument value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ArgValue {
    /// A quoted string literal, unescaped.
    Str(String),
    /// An unquoted word: identifier, number, duration, dotted name.
    Word(String),
}

impl ArgValue {
    /// The textual payload, regardless of quoting.
    pub fn as_str(&self) -> &str {
        match self {
            ArgValue::Str(s) | ArgValue::Word(s) => s,
        }
    }
}

/// One call argument, positional or `key=value`.
#[derive(Debug, Clone)]
pub struct CallArg {
    pub key: Option<String>,
    pub value: ArgValue,
    pub span: Span,
}

/// A call expression, e.g. `cron.NewJob("welcome", endpoint=SendWelcome)`.
#[derive(Debug, Clone)]
pub struct CallExpr {
    /// Dotted callee name as written.
    pub callee: String,
    pub callee_span: Span,
    pub args: Vec<CallArg>,
    pub span: Span,
}

impl CallExpr {
    /// The value of a `key=value` argument.
    pub fn get(&self, key: &str) -> Option<&CallArg> {
        self.args.iter().find(|a| a.key.as_deref() == Some(key))
    }

    /// The nth positional (un-keyed) argument.
    pub fn positional(&self, n: usize) -> Option<&CallArg> {
        self.args.iter().filter(|a| a.key.is_none()).nth(n)
    }

    /// Returns true if a bare word argument `name` is present.
    pub fn has_flag(&self, name: &str) -> bool {
        self.args
            .iter()
            .any(|a| a.key.is_none() && a.value == ArgValue::Word(name.to_string()))
    }

    /// Keys of all `key=value` arguments.
    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.args.iter().filter_map(|a| a.key.as_deref())
    }
}

/// A declaration with its attached annotations.
#[derive(Debug, Clone)]
pub struct SourceItem {
    /// Plain comment text directly above the directives/declaration.
    pub doc: Option<String>,
    /// Directives immediately preceding the declaration.
    pub directives: Vec<Directive>,
    pub decl: Decl,
}

/// A recognized package-level declaration.
#[derive(Debug, Clone)]
pub enum Decl {
    Func(FuncDecl),
    Var(VarDecl),
}

/// Everything the scanner extracts from one file.
#[derive(Debug, Default)]
pub struct ScanOutput {
    /// Annotated package-level declarations, in file order.
    pub items: Vec<SourceItem>,
    /// Call expressions found outside package-level initializers.
    pub body_calls: Vec<CallExpr>,
    /// Directive-syntax problems.
    pub issues: Vec<DirectiveIssue>,
}

/// Scan one source file.
pub fn scan_file(namespace: &str, path: &str, source: &str) -> ScanOutput {
    let mut out = ScanOutput::default();
    let mut depth: i32 = 0;
    let mut pending_doc: Vec<String> = Vec::new();
    let mut pending_directives: Vec<Directive> = Vec::new();

    let mut offset = 0;
    for raw_line in source.split('\n') {
        let line_start = offset;
        offset += raw_line.len() + 1;
        let line = raw_line.strip_suffix('\r').unwrap_or(raw_line);
        let trimmed = line.trim();

        if depth > 0 {
            if !trimmed.starts_with("//") {
                out.body_calls.extend(find_calls(path, line, line_start));
                depth = (depth + brace_delta(line)).max(0);
            }
            continue;
        }

        if trimmed.is_empty() {
            // A blank line breaks directive attachment.
            flush_orphans(&mut pending_doc, &mut pending_directives, &mut out);
            continue;
        }

        if trimmed.starts_with("//") {
            match parse_comment(namespace, path, line, line_start) {
                CommentLine::Plain => {
                    let text = trimmed.trim_start_matches('/').trim().to_string();
                    pending_doc.push(text);
                }
                CommentLine::Directive(d) => pending_directives.push(d),
                CommentLine::Malformed(issue) => out.issues.push(issue),
            }
            continue;
        }

        if let Some(func) = parse_func(path, line, line_start) {
            out.items.push(SourceItem {
                doc: take_doc(&mut pending_doc),
                directives: std::mem::take(&mut pending_directives),
                decl: Decl::Func(func),
            });
        } else if let Some((var, stray_calls)) = parse_var(path, line, line_start) {
            out.body_calls.extend(stray_calls);
            out.items.push(SourceItem {
                doc: take_doc(&mut pending_doc),
                directives: std::mem::take(&mut pending_directives),
                decl: Decl::Var(var),
            });
        } else {
            // An unrelated statement: breaks attachment, and any call in it
            // is an ordinary (body) call site.
            flush_orphans(&mut pending_doc, &mut pending_directives, &mut out);
            out.body_calls.extend(find_calls(path, line, line_start));
        }

        depth = (depth + brace_delta(line)).max(0);
    }

    flush_orphans(&mut pending_doc, &mut pending_directives, &mut out);
    out
}

fn take_doc(pending: &mut Vec<String>) -> Option<String> {
    if pending.is_empty() {
        None
    } else {
        Some(std::mem::take(pending).join("\n"))
    }
}

fn flush_orphans(doc: &mut Vec<String>, directives: &mut Vec<Directive>, out: &mut ScanOutput) {
    doc.clear();
    for d in directives.drain(..) {
        out.issues.push(DirectiveIssue {
            message: "directive is not attached to a declaration".to_string(),
            span: d.span,
        });
    }
}

/// Net brace depth change of a line, ignoring braces in strings and
/// trailing comments.
fn brace_delta(line: &str) -> i32 {
    let mut delta = 0;
    let mut chars = line.chars().peekable();
    let mut in_str = false;
    while let Some(c) = chars.next() {
        match c {
            '\\' if in_str => {
                chars.next();
            }
            '"' => in_str = !in_str,
            '/' if !in_str && chars.peek() == Some(&'/') => break,
            '{' if !in_str => delta += 1,
            '}' if !in_str => delta -= 1,
            _ => {}
        }
    }
    delta
}

fn is_ident_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == '_'
}

/// Parse `func Name(params) results {`.
fn parse_func(path: &str, line: &str, line_start: usize) -> Option<FuncDecl> {
    let indent = line.len() - line.trim_start().len();
    let rest = line[indent..].strip_prefix("func ")?;
    let name_start = indent + 5;

    let name: String = rest.chars().take_while(|&c| is_ident_char(c)).collect();
    if name.is_empty() {
        return None;
    }
    let open = name_start + name.len();
    if line[open..].chars().next() != Some('(') {
        return None;
    }
    let close = open + line[open..].find(')')?;

    let mut params = Vec::new();
    for (piece_start, piece) in split_top_level(&line[open + 1..close], open + 1) {
        let trimmed = piece.trim();
        if trimmed.is_empty() {
            continue;
        }
        let lead = piece.len() - piece.trim_start().len();
        let mut words = trimmed.split_whitespace();
        let (pname, ty) = (words.next()?, words.next()?);
        if words.next().is_some() {
            return None;
        }
        params.push(Param {
            name: pname.to_string(),
            ty: ty.trim_start_matches('*').to_string(),
            pointer: ty.starts_with('*'),
            span: Span::new(path, line_start + piece_start + lead, {
                line_start + piece_start + lead + trimmed.len()
            }),
        });
    }

    let tail = &line[close + 1..];
    let tail = tail.split("//").next().unwrap_or(tail);
    let tail = tail.trim_end_matches('{').trim();
    let results: Vec<String> = if tail.is_empty() {
        Vec::new()
    } else {
        let inner = tail
            .strip_prefix('(')
            .and_then(|t| t.strip_suffix(')'))
            .unwrap_or(tail);
        inner.split(',').map(|r| r.trim().to_string()).collect()
    };

    Some(FuncDecl {
        name_span: Span::new(path, line_start + name_start, line_start + open),
        params_span: Span::new(path, line_start + open, line_start + close + 1),
        name,
        params,
        results,
        span: Span::new(path, line_start + indent, line_start + line.trim_end().len()),
    })
}

/// Parse `var name = initializer`.
///
/// Returns the declaration plus any call expressions that appear in an
/// initializer that is *not* a single call (those count as ordinary call
/// sites, which matters for the cron sole-initializer rule).
fn parse_var(path: &str, line: &str, line_start: usize) -> Option<(VarDecl, Vec<CallExpr>)> {
    let indent = line.len() - line.trim_start().len();
    let rest = line[indent..].strip_prefix("var ")?;
    let name_start = indent + 4;

    let name: String = rest.chars().take_while(|&c| is_ident_char(c)).collect();
    if name.is_empty() {
        return None;
    }

    let after_name = name_start + name.len();
    let tail = line[after_name..].trim_start();
    let tail_start = line.len() - tail.len();

    let mut init = None;
    let mut stray = Vec::new();
    if let Some(expr) = tail.strip_prefix('=') {
        let expr_offset = tail_start + 1 + (expr.len() - expr.trim_start().len());
        match parse_call_at(path, line, line_start, expr_offset) {
            Some((call, end)) if line[end..].trim().is_empty() => {
                // Calls nested inside the initializer are still ordinary
                // call sites (a wrapped constructor is not a declaration).
                stray = find_calls(path, line, line_start)
                    .into_iter()
                    .filter(|c| c.span.start > line_start + expr_offset)
                    .collect();
                init = Some(call);
            }
            _ => {
                if !expr.trim().is_empty() {
                    stray = find_calls(path, line, line_start)
                        .into_iter()
                        .filter(|c| c.span.start >= line_start + expr_offset)
                        .collect();
                }
            }
        }
    }

    let var = VarDecl {
        name_span: Span::new(path, line_start + name_start, line_start + after_name),
        name,
        init,
        span: Span::new(path, line_start + indent, line_start + line.trim_end().len()),
    };
    Some((var, stray))
}

/// Parse a call expression starting at byte index `at` within `line`.
///
/// Returns the call and the byte index just past its closing parenthesis.
fn parse_call_at(
    path: &str,
    line: &str,
    line_start: usize,
    at: usize,
) -> Option<(CallExpr, usize)> {
    let rest = &line[at..];
    let callee: String = rest
        .chars()
        .take_while(|&c| is_ident_char(c) || c == '.')
        .collect();
    if callee.is_empty() || callee.starts_with('.') || callee.ends_with('.') {
        return None;
    }
    let open = at + callee.len();
    if line[open..].chars().next() != Some('(') {
        return None;
    }

    // Find the matching close paren, quote-aware.
    let mut nesting = 0i32;
    let mut in_str = false;
    let mut close = None;
    let mut chars = line[open..].char_indices().peekable();
    while let Some((i, c)) = chars.next() {
        match c {
            '\\' if in_str => {
                chars.next();
            }
            '"' => in_str = !in_str,
            '(' if !in_str => nesting += 1,
            ')' if !in_str => {
                nesting -= 1;
                if nesting == 0 {
                    close = Some(open + i);
                    break;
                }
            }
            _ => {}
        }
    }
    let close = close?;

    let mut args = Vec::new();
    for (piece_start, piece) in split_top_level(&line[open + 1..close], open + 1) {
        let trimmed = piece.trim();
        if trimmed.is_empty() {
            continue;
        }
        let lead = piece.len() - piece.trim_start().len();
        let arg_start = line_start + piece_start + lead;
        let span = Span::new(path, arg_start, arg_start + trimmed.len());
        args.push(parse_arg(trimmed, span));
    }

    let call = CallExpr {
        callee_span: Span::new(path, line_start + at, line_start + open),
        callee,
        args,
        span: Span::new(path, line_start + at, line_start + close + 1),
    };
    Some((call, close + 1))
}

/// Parse one trimmed argument: `"literal"`, `word`, or `key=value`.
fn parse_arg(text: &str, span: Span) -> CallArg {
    if let Some((key, value)) = text.split_once('=') {
        let key = key.trim();
        if !key.is_empty() && key.chars().all(is_ident_char) && !text.starts_with('"') {
            return CallArg {
                key: Some(key.to_string()),
                value: parse_value(value.trim()),
                span,
            };
        }
    }
    CallArg {
        key: None,
        value: parse_value(text),
        span,
    }
}

fn parse_value(text: &str) -> ArgValue {
    if let Some(inner) = text.strip_prefix('"').and_then(|t| t.strip_suffix('"')) {
        ArgValue::Str(inner.replace("\\\"", "\"").replace("\\\\", "\\"))
    } else {
        ArgValue::Word(text.to_string())
    }
}

/// Split on top-level commas, respecting quotes and nested parentheses.
/// Yields `(byte_offset_in_line, piece)` pairs.
fn split_top_level(text: &str, base: usize) -> Vec<(usize, &str)> {
    let mut out = Vec::new();
    let mut start = 0;
    let mut nesting = 0i32;
    let mut in_str = false;
    let mut chars = text.char_indices().peekable();
    while let Some((i, c)) = chars.next() {
        match c {
            '\\' if in_str => {
                chars.next();
            }
            '"' => in_str = !in_str,
            '(' if !in_str => nesting += 1,
            ')' if !in_str => nesting -= 1,
            ',' if !in_str && nesting == 0 => {
                out.push((base + start, &text[start..i]));
                start = i + 1;
            }
            _ => {}
        }
    }
    out.push((base + start, &text[start..]));
    out
}

/// Find every call expression in a line, including nested ones.
fn find_calls(path: &str, line: &str, line_start: usize) -> Vec<CallExpr> {
    let mut out = Vec::new();
    let mut in_str = false;
    let mut prev_ident = false;
    let mut chars = line.char_indices().peekable();
    while let Some((i, c)) = chars.next() {
        match c {
            '\\' if in_str => {
                chars.next();
                continue;
            }
            '"' => {
                in_str = !in_str;
                prev_ident = false;
                continue;
            }
            '/' if !in_str && chars.peek().map(|&(_, c)| c) == Some('/') => break,
            _ => {}
        }
        if in_str {
            continue;
        }
        if (c.is_ascii_alphabetic() || c == '_') && !prev_ident {
            if let Some((call, _)) = parse_call_at(path, line, line_start, i) {
                // Continue scanning just past the open paren so nested
                // calls are found too.
                out.push(call);
            }
        }
        prev_ident = is_ident_char(c) || c == '.';
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn scan(source: &str) -> ScanOutput {
        scan_file("quarry", "blog/api.qy", source)
    }

    #[test]
    fn test_scan_annotated_func() {
        let out = scan(
            "// Get a post by id.\n//quarry:api public path=/posts/:id\nfunc GetPost(ctx Context, id string) (*Post, error) {\n\treturn load(ctx, id)\n}\n",
        );

        assert_eq!(out.items.len(), 1);
        let item = &out.items[0];
        assert_eq!(item.doc.as_deref(), Some("Get a post by id."));
        assert_eq!(item.directives.len(), 1);
        assert_eq!(item.directives[0].kind, "api");

        let Decl::Func(func) = &item.decl else {
            panic!("expected func");
        };
        assert_eq!(func.name, "GetPost");
        assert_eq!(func.params.len(), 2);
        assert_eq!(func.params[0].ty, "Context");
        assert!(!func.params[0].pointer);
        assert_eq!(func.params[1].name, "id");
        assert_eq!(func.results, vec!["*Post", "error"]);

        // The body call is recorded, not treated as a declaration.
        assert_eq!(out.body_calls.len(), 1);
        assert_eq!(out.body_calls[0].callee, "load");
    }

    #[test]
    fn test_scan_var_with_call_initializer() {
        let out = scan(
            "var welcome = cron.NewJob(\"welcome\", endpoint=SendWelcome, every=30m)\n",
        );

        assert_eq!(out.items.len(), 1);
        let Decl::Var(var) = &out.items[0].decl else {
            panic!("expected var");
        };
        assert_eq!(var.name, "welcome");
        let call = var.init.as_ref().unwrap();
        assert_eq!(call.callee, "cron.NewJob");
        assert_eq!(
            call.positional(0).unwrap().value,
            ArgValue::Str("welcome".to_string())
        );
        assert_eq!(call.get("endpoint").unwrap().value.as_str(), "SendWelcome");
        assert_eq!(call.get("every").unwrap().value.as_str(), "30m");
        assert!(out.body_calls.is_empty());
    }

    #[test]
    fn test_wrapped_initializer_counts_as_call_site() {
        let out = scan("var job = wrap(cron.NewJob(\"daily\", endpoint=Run))\n");

        let Decl::Var(var) = &out.items[0].decl else {
            panic!("expected var");
        };
        // The initializer is `wrap(...)`; the nested construction is not a
        // declaration and surfaces as an ordinary call site.
        assert_eq!(var.init.as_ref().unwrap().callee, "wrap");
        assert_eq!(out.body_calls.len(), 1);
        assert_eq!(out.body_calls[0].callee, "cron.NewJob");
    }

    #[test]
    fn test_calls_inside_function_bodies() {
        let out = scan(
            "func Handler(ctx Context) error {\n\tcron.NewJob(\"sneaky\", endpoint=Run)\n\tSendWelcome(ctx)\n\treturn nil\n}\n",
        );

        let callees: Vec<_> = out.body_calls.iter().map(|c| c.callee.as_str()).collect();
        assert_eq!(callees, vec!["cron.NewJob", "SendWelcome"]);
    }

    #[test]
    fn test_blank_line_breaks_directive_attachment() {
        let out = scan("//quarry:api public\n\nfunc GetPost(ctx Context) error {\n}\n");

        assert!(out.items[0].directives.is_empty());
        assert_eq!(out.issues.len(), 1);
        assert!(out.issues[0].message.contains("not attached"));
    }

    #[test]
    fn test_unrelated_statement_breaks_attachment() {
        let out = scan("//quarry:api public\ntype Post struct {\n}\nfunc GetPost(ctx Context) error {\n}\n");

        assert_eq!(out.issues.len(), 1);
        assert_eq!(out.items.len(), 1);
        assert!(out.items[0].directives.is_empty());
    }

    #[test]
    fn test_trailing_directive_is_orphaned() {
        let out = scan("func A(ctx Context) error {\n}\n//quarry:api public\n");
        assert_eq!(out.issues.len(), 1);
    }

    #[test]
    fn test_braces_in_strings_do_not_change_depth() {
        let out = scan(
            "func A(ctx Context) error {\n\tlog(\"{ not a brace\")\n}\nvar t = pubsub.NewTopic(\"signups\", message=Signup)\n",
        );
        assert_eq!(out.items.len(), 2);
    }

    #[test]
    fn test_param_spans_point_into_line() {
        let source = "func GetPost(ctx Context, id string) error {\n}\n";
        let out = scan(source);
        let Decl::Func(func) = &out.items[0].decl else {
            panic!("expected func");
        };
        let span = &func.params[1].span;
        assert_eq!(&source[span.start..span.end], "id string");
        let span = &func.params_span;
        assert_eq!(&source[span.start..span.end], "(ctx Context, id string)");
    }
}
