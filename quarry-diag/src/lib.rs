//! Diagnostics engine for the Quarry discovery engine.
//!
//! This crate provides the diagnostic record (stable code, labeled source
//! annotations, optional hint with documentation link), a thread-safe
//! collecting sink shared by the parallel per-package parsers, and a
//! byte-stable plain-text renderer.
//!
//! Diagnostics are collected best-effort: a failure in one resource never
//! stops collection for unrelated resources. Before rendering, the full set
//! is sorted by source position so the report is a function of source
//! content alone, independent of parser execution order.

mod render;

use std::sync::{Arc, Mutex};

use quarry_core::Span;
use serde::Serialize;

pub use render::render_report;

/// Severity level for a diagnostic.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum Severity {
    /// The run fails; no graph is produced.
    Error,
    /// Reported but does not fail the run.
    Warning,
}

impl Severity {
    /// Returns true if this is an error severity.
    pub fn is_error(&self) -> bool {
        matches!(self, Severity::Error)
    }
}

impl std::fmt::Display for Severity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Severity::Error => write!(f, "error"),
            Severity::Warning => write!(f, "warning"),
        }
    }
}

/// One labeled source location attached to a diagnostic.
#[derive(Debug, Clone, Serialize)]
pub struct Annotation {
    /// The annotated source range.
    pub span: Span,
    /// Inline label rendered under the underline.
    pub label: String,
    /// The full source text of the annotated file, when available.
    ///
    /// Carried so the renderer can show a source window without touching
    /// the filesystem. Filesystem-level diagnostics (migration filenames)
    /// have no source and render as a bare location line.
    #[serde(skip)]
    pub source: Option<Arc<str>>,
}

/// An immutable diagnostic record.
#[derive(Debug, Clone, Serialize)]
pub struct Diagnostic {
    /// Stable code, e.g. `quarry::missing_migration`.
    pub code: &'static str,
    /// Severity level.
    pub severity: Severity,
    /// Short human-readable title.
    pub message: String,
    /// Labeled source locations; at least one.
    pub annotations: Vec<Annotation>,
    /// Optional trailing hint.
    pub hint: Option<String>,
    /// Optional documentation link, rendered with the hint.
    pub doc_url: Option<String>,
}

impl Diagnostic {
    /// Create an error diagnostic with one annotation.
    pub fn error(code: &'static str, message: impl Into<String>, span: Span) -> Self {
        Self {
            code,
            severity: Severity::Error,
            message: message.into(),
            annotations: vec![Annotation {
                span,
                label: String::new(),
                source: None,
            }],
            hint: None,
            doc_url: None,
        }
    }

    /// Create a warning diagnostic with one annotation.
    pub fn warning(code: &'static str, message: impl Into<String>, span: Span) -> Self {
        Self {
            severity: Severity::Warning,
            ..Self::error(code, message, span)
        }
    }

    /// Set the label of the primary (first) annotation.
    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        if let Some(first) = self.annotations.first_mut() {
            first.label = label.into();
        }
        self
    }

    /// Attach the source text of the primary annotation's file.
    pub fn with_source(mut self, source: Arc<str>) -> Self {
        if let Some(first) = self.annotations.first_mut() {
            first.source = Some(source);
        }
        self
    }

    /// Add a secondary annotation.
    pub fn with_annotation(
        mut self,
        span: Span,
        label: impl Into<String>,
        source: Option<Arc<str>>,
    ) -> Self {
        self.annotations.push(Annotation {
            span,
            label: label.into(),
            source,
        });
        self
    }

    /// Add a trailing hint.
    pub fn with_hint(mut self, hint: impl Into<String>) -> Self {
        self.hint = Some(hint.into());
        self
    }

    /// Add a documentation link to the hint.
    pub fn with_doc(mut self, url: impl Into<String>) -> Self {
        self.doc_url = Some(url.into());
        self
    }

    /// The span of the primary annotation.
    pub fn primary_span(&self) -> Option<&Span> {
        self.annotations.first().map(|a| &a.span)
    }

    fn sort_key(&self) -> (Span, &'static str, &str) {
        let span = self
            .primary_span()
            .cloned()
            .unwrap_or_else(|| Span::file(""));
        (span, self.code, self.message.as_str())
    }
}

/// Sort diagnostics deterministically by (file path, position, code, message).
pub fn sort_diagnostics(diagnostics: &mut [Diagnostic]) {
    diagnostics.sort_by(|a, b| a.sort_key().cmp(&b.sort_key()));
}

/// A thread-safe collecting sink for diagnostics.
///
/// Shared by every per-package discovery task; append is the only mutation,
/// so a mutex over a vector is all the coordination required.
#[derive(Debug, Default)]
pub struct DiagnosticSink {
    inner: Mutex<Vec<Diagnostic>>,
}

impl DiagnosticSink {
    /// Create an empty sink.
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a diagnostic.
    pub fn add(&self, diagnostic: Diagnostic) {
        self.inner.lock().expect("diagnostic sink poisoned").push(diagnostic);
    }

    /// Number of collected diagnostics.
    pub fn len(&self) -> usize {
        self.inner.lock().expect("diagnostic sink poisoned").len()
    }

    /// Returns true if nothing has been collected.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Returns true if any collected diagnostic is an error.
    pub fn has_errors(&self) -> bool {
        self.inner
            .lock()
            .expect("diagnostic sink poisoned")
            .iter()
            .any(|d| d.severity.is_error())
    }

    /// Drain the sink into a deterministically sorted list.
    pub fn into_sorted(self) -> Vec<Diagnostic> {
        let mut diagnostics = self.inner.into_inner().expect("diagnostic sink poisoned");
        sort_diagnostics(&mut diagnostics);
        diagnostics
    }
}
