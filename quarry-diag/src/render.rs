//! Plain-text diagnostic rendering.
//!
//! Output is byte-stable for identical input so reports can be snapshot
//! tested. No colors, no terminal detection.

use crate::{Annotation, Diagnostic};

/// Total width of the boxed header line.
const HEADER_WIDTH: usize = 78;

/// Render a full report from an already-sorted diagnostic list.
///
/// Each diagnostic renders as a boxed header carrying its stable code, one
/// source-excerpt block per annotation, and an optional trailing hint with
/// a documentation link. Diagnostics are separated by a blank line.
pub fn render_report(diagnostics: &[Diagnostic]) -> String {
    let mut out = String::new();
    for (i, diagnostic) in diagnostics.iter().enumerate() {
        if i > 0 {
            out.push('\n');
        }
        render_diagnostic(diagnostic, &mut out);
    }
    out
}

fn render_diagnostic(diagnostic: &Diagnostic, out: &mut String) {
    render_header(diagnostic, out);
    for annotation in &diagnostic.annotations {
        render_annotation(annotation, out);
    }
    if let Some(hint) = &diagnostic.hint {
        out.push('\n');
        out.push_str("  hint: ");
        out.push_str(hint);
        out.push('\n');
        if let Some(url) = &diagnostic.doc_url {
            out.push_str("        ");
            out.push_str(url);
            out.push('\n');
        }
    }
}

/// `── title ───...─ [code]`, padded to a fixed width with the code
/// right-aligned.
fn render_header(diagnostic: &Diagnostic, out: &mut String) {
    let left = format!("── {} ", diagnostic.message);
    let right = format!("[{}]", diagnostic.code);
    let fill = HEADER_WIDTH.saturating_sub(left.chars().count() + right.chars().count());
    out.push_str(&left);
    for _ in 0..fill {
        out.push('─');
    }
    out.push_str(&right);
    out.push('\n');
}

fn render_annotation(annotation: &Annotation, out: &mut String) {
    let span = &annotation.span;

    let Some(source) = &annotation.source else {
        // No source window available (e.g. filesystem-level diagnostics):
        // render a bare location line, with the label when there is one.
        out.push_str("  --> ");
        out.push_str(&span.path);
        out.push('\n');
        if !annotation.label.is_empty() {
            out.push_str("      ");
            out.push_str(&annotation.label);
            out.push('\n');
        }
        return;
    };

    let (line, col) = span.line_col(source);
    let line_text = source.lines().nth(line.saturating_sub(1)).unwrap_or("");

    out.push_str(&format!("  --> {}:{}:{}\n", span.path, line, col));

    let gutter = line.to_string().len().max(2);
    out.push_str(&format!("{:>gutter$} |\n", ""));
    out.push_str(&format!("{line:>gutter$} | {line_text}\n"));

    // Underline the span within the excerpt line, clamped to the line end.
    // Width is counted in characters to stay aligned with the column.
    let width = source
        .get(span.start..span.end)
        .map_or(0, |text| text.chars().count())
        .max(1);
    let avail = line_text.chars().count().saturating_sub(col - 1).max(1);
    let carets = width.min(avail);
    out.push_str(&format!("{:>gutter$} | {:>pad$}", "", "", pad = col - 1));
    for _ in 0..carets {
        out.push('^');
    }
    if !annotation.label.is_empty() {
        out.push(' ');
        out.push_str(&annotation.label);
    }
    out.push('\n');
}
