//! Per-package discovery pass state and the shared resource registry.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use indexmap::IndexMap;
use quarry_core::{AppRoot, Package};
use quarry_diag::DiagnosticSink;
use quarry_graph::{Bind, BindKind, Resource, ResourceId};

use crate::error::FatalError;
use crate::syntax::ScanOutput;

/// Cooperative cancellation flag shared by all discovery tasks.
///
/// Tasks check it at blocking boundaries (before reading file contents);
/// already-running computation is allowed to finish.
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    /// Request cancellation.
    pub fn cancel(&self) {
        self.0.store(true, Ordering::Relaxed);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::Relaxed)
    }
}

/// One scanned source file, with contents pinned for the pass.
#[derive(Debug)]
pub struct ScannedSource {
    /// App-root-relative path.
    pub path: String,
    /// Full file contents, shared with diagnostics for rendering.
    pub source: Arc<str>,
    /// Scanner output.
    pub output: ScanOutput,
}

/// The shared, thread-safe collection point for resources and binds.
///
/// Registration is the id-uniqueness barrier: insertion checks for a
/// colliding id under the same lock that inserts, so exactly one of two
/// racing registrations observes the collision. A collision is fatal and
/// cancels the run.
#[derive(Debug)]
pub struct ResourceRegistry {
    resources: Mutex<IndexMap<ResourceId, Resource>>,
    binds: Mutex<Vec<Bind>>,
    fatal: Mutex<Option<FatalError>>,
    cancel: CancelToken,
}

impl ResourceRegistry {
    pub fn new(cancel: CancelToken) -> Self {
        Self {
            resources: Mutex::new(IndexMap::new()),
            binds: Mutex::new(Vec::new()),
            fatal: Mutex::new(None),
            cancel,
        }
    }

    /// Register a resource, enforcing id uniqueness atomically.
    ///
    /// Returns false if the id collides; the collision is recorded as the
    /// run's fatal error and cancellation is requested.
    pub fn register(&self, resource: Resource) -> bool {
        let mut resources = self.resources.lock().expect("registry poisoned");
        if resources.contains_key(&resource.id) {
            drop(resources);
            self.abort(FatalError::DuplicateResource {
                id: resource.id.to_string(),
            });
            return false;
        }
        resources.insert(resource.id.clone(), resource);
        true
    }

    /// Record a bind.
    pub fn add_bind(&self, bind: Bind) {
        self.binds.lock().expect("registry poisoned").push(bind);
    }

    /// Record a fatal error and cancel the run. The first fatal wins.
    pub fn abort(&self, error: FatalError) {
        let mut fatal = self.fatal.lock().expect("registry poisoned");
        if fatal.is_none() {
            *fatal = Some(error);
        }
        self.cancel.cancel();
    }

    /// The recorded fatal error, if any.
    pub fn fatal(&self) -> Option<FatalError> {
        self.fatal.lock().expect("registry poisoned").clone()
    }

    /// Drain the registry into deterministically ordered resources and
    /// binds, independent of package completion order.
    pub fn finish(self) -> (Vec<Resource>, Vec<Bind>) {
        let resources = self.resources.into_inner().expect("registry poisoned");
        let mut resources: Vec<Resource> = resources.into_values().collect();
        resources.sort_by(|a, b| a.id.cmp(&b.id));

        let mut binds = self.binds.into_inner().expect("registry poisoned");
        binds.sort_by(|a, b| {
            (&a.site, bind_kind_ord(a.kind)).cmp(&(&b.site, bind_kind_ord(b.kind)))
        });
        (resources, binds)
    }
}

fn bind_kind_ord(kind: BindKind) -> u8 {
    match kind {
        BindKind::Implicit => 0,
        BindKind::Create => 1,
        BindKind::Reference => 2,
        BindKind::Call => 3,
    }
}

/// Everything a resource parser needs for one package.
pub struct Pass<'a> {
    pub pkg: &'a Package,
    pub app_root: &'a AppRoot,
    /// Directive namespace, e.g. `quarry`.
    pub namespace: &'a str,
    /// Base URL for documentation links in hints.
    pub docs_base_url: &'a str,
    /// The package's scanned sources, in filename order.
    pub sources: &'a [ScannedSource],
    pub diags: &'a DiagnosticSink,
    pub registry: &'a ResourceRegistry,
}

impl Pass<'_> {
    /// Contents of one of the package's source files.
    pub fn source(&self, path: &str) -> Option<Arc<str>> {
        self.sources
            .iter()
            .find(|s| s.path == path)
            .map(|s| s.source.clone())
    }

    /// A documentation link for hints.
    pub fn docs_url(&self, topic: &str) -> String {
        format!("{}/{}", self.docs_base_url.trim_end_matches('/'), topic)
    }

    /// Heuristic: does this package look like it declares a service?
    ///
    /// Used to soften resource rules for non-service packages (a stray
    /// `migrations` directory in a docs folder is not an error). The check
    /// is textual on purpose: it must not depend on the package having
    /// parsed cleanly.
    pub fn is_likely_service(&self) -> bool {
        let ns = self.namespace;
        let markers = [
            format!("//{ns}:api"),
            format!("//{ns}:service"),
            format!("//{ns}:authhandler"),
        ];
        self.sources.iter().any(|s| {
            markers.iter().any(|m| s.source.contains(m.as_str()))
                || s.source.contains("pubsub.NewSubscription(")
        })
    }
}
