//! Bind records: where resources are used.

use quarry_core::Span;
use serde::Serialize;

use crate::{EndpointRef, ResourceId};

/// A recorded reference between a resource and a usage site.
#[derive(Debug, Clone, Serialize)]
pub struct Bind {
    /// The resource being referenced.
    pub target: BindTarget,
    /// Where the reference occurs.
    pub site: Span,
    /// How the resource is referenced.
    pub kind: BindKind,
}

/// The target of a bind.
///
/// Endpoint references recorded during per-package parsing stay symbolic
/// until the global validation barrier, since the referenced endpoint may
/// live in a package that has not finished discovery yet.
#[derive(Debug, Clone, Serialize)]
pub enum BindTarget {
    /// A resource known by id.
    Id(ResourceId),
    /// An endpoint known only by (package, name).
    Endpoint(EndpointRef),
}

/// How a resource is referenced at a site.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum BindKind {
    /// Co-located in the declaring package, with no explicit reference.
    Implicit,
    /// The declaration site that creates the resource.
    Create,
    /// A direct reference in code (e.g. a cron job's handler).
    Reference,
    /// An invocation as a plain call.
    Call,
}

impl BindKind {
    /// Returns true for binds written explicitly in code.
    pub fn is_explicit(&self) -> bool {
        !matches!(self, BindKind::Implicit)
    }
}
