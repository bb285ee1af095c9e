//! The discovery run: parallel per-package parsing, barrier, validation.

use std::collections::HashMap;
use std::sync::Arc;

use quarry_core::{AppConfig, AppRoot, Package, Span};
use quarry_diag::{Diagnostic, DiagnosticSink, render_report};
use quarry_graph::ResourceGraph;

use crate::codes;
use crate::error::DiscoveryError;
use crate::parsers::PARSERS;
use crate::pass::{CancelToken, Pass, ResourceRegistry, ScannedSource};
use crate::syntax::scan_file;
use crate::validate::{RuleContext, rules};

/// Configuration for one discovery run.
#[derive(Debug, Clone)]
pub struct DiscoveryConfig {
    pub app_root: AppRoot,
    /// Application name; names the root package.
    pub app_name: String,
    /// Directive namespace.
    pub namespace: String,
    /// Base URL for documentation links in hints.
    pub docs_base_url: String,
}

impl DiscoveryConfig {
    /// Build a config from the loaded application manifest.
    pub fn new(app_root: AppRoot, app: &AppConfig) -> Self {
        Self {
            app_root,
            app_name: app.name.clone(),
            namespace: app.namespace.clone(),
            docs_base_url: app.docs_base_url.clone(),
        }
    }
}

/// Run discovery over the given packages.
pub fn run_discovery(
    config: &DiscoveryConfig,
    packages: &[Package],
) -> Result<ResourceGraph, DiscoveryError> {
    run_discovery_with_cancel(config, packages, CancelToken::new())
}

/// Run discovery with an externally held cancellation token.
///
/// Packages are processed in parallel, one scoped thread each; the scope
/// join is the synchronization barrier. Global rules and finalization only
/// happen after it, so they always see the complete resource and bind sets.
pub fn run_discovery_with_cancel(
    config: &DiscoveryConfig,
    packages: &[Package],
    cancel: CancelToken,
) -> Result<ResourceGraph, DiscoveryError> {
    let diags = DiagnosticSink::new();
    let registry = ResourceRegistry::new(cancel.clone());

    let scanned: Vec<Vec<ScannedSource>> = std::thread::scope(|scope| {
        let handles: Vec<_> = packages
            .iter()
            .map(|pkg| {
                let diags = &diags;
                let registry = &registry;
                let cancel = &cancel;
                scope.spawn(move || discover_package(config, pkg, diags, registry, cancel))
            })
            .collect();
        handles
            .into_iter()
            .map(|h| h.join().expect("discovery task panicked"))
            .collect()
    });

    if let Some(fatal) = registry.fatal() {
        return Err(fatal.into());
    }
    if cancel.is_cancelled() {
        return Err(DiscoveryError::Cancelled);
    }

    let (resources, binds) = registry.finish();

    let mut sources: HashMap<String, Arc<str>> = HashMap::new();
    for src in scanned.iter().flatten() {
        sources.insert(src.path.clone(), src.source.clone());
    }

    let ctx = RuleContext::new(&resources, &binds, &diags, &config.docs_base_url, &sources);
    for rule in rules() {
        rule.check(&ctx);
    }

    if diags.has_errors() {
        let diagnostics = diags.into_sorted();
        let report = render_report(&diagnostics);
        return Err(DiscoveryError::Invalid {
            diagnostics,
            report,
        });
    }

    Ok(ResourceGraph::freeze(resources, binds))
}

/// Scan and parse one package.
fn discover_package(
    config: &DiscoveryConfig,
    pkg: &Package,
    diags: &DiagnosticSink,
    registry: &ResourceRegistry,
    cancel: &CancelToken,
) -> Vec<ScannedSource> {
    let mut sources = Vec::new();
    for file in &pkg.files {
        if cancel.is_cancelled() {
            return sources;
        }
        match file.contents() {
            Ok(source) => {
                let output = scan_file(&config.namespace, file.rel_path(), &source);
                sources.push(ScannedSource {
                    path: file.rel_path().to_string(),
                    source,
                    output,
                });
            }
            Err(err) => {
                // An unreadable file fails the run but never stops the
                // package's remaining files from being checked.
                diags.add(
                    Diagnostic::error(
                        codes::SOURCE_UNREADABLE,
                        format!("cannot read source file of package '{}'", pkg.name),
                        Span::file(file.rel_path()),
                    )
                    .with_label(err.to_string()),
                );
            }
        }
    }

    for src in &sources {
        for issue in &src.output.issues {
            diags.add(
                Diagnostic::error(
                    codes::INVALID_DIRECTIVE,
                    issue.message.clone(),
                    issue.span.clone(),
                )
                .with_source(src.source.clone()),
            );
        }
    }

    let pass = Pass {
        pkg,
        app_root: &config.app_root,
        namespace: &config.namespace,
        docs_base_url: &config.docs_base_url,
        sources: &sources,
        diags,
        registry,
    };
    for parser in PARSERS {
        if cancel.is_cancelled() {
            break;
        }
        let interested = !pass.sources.is_empty()
            || parser.interesting_subdirs.iter().any(|s| pkg.has_subdir(s));
        if interested {
            (parser.run)(&pass);
        }
    }

    sources
}
