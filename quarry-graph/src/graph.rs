//! The finalized resource graph.

use std::collections::HashMap;

use serde::Serialize;

use crate::{Bind, EndpointRef, Resource, ResourceId, ResourceKind};

/// The immutable aggregate of all discovered resources and binds.
///
/// A graph exists only for runs that cleared the validation barrier with no
/// diagnostics; failed or cancelled runs never produce one.
#[derive(Debug, Serialize)]
pub struct ResourceGraph {
    resources: Vec<Resource>,
    binds: Vec<Bind>,
    #[serde(skip)]
    by_id: HashMap<ResourceId, usize>,
    #[serde(skip)]
    by_name: HashMap<(String, String, ResourceKind), usize>,
}

impl ResourceGraph {
    /// Freeze a completed discovery pass into a graph.
    ///
    /// Callers guarantee ids are unique; registration enforces this before
    /// the graph is ever built.
    pub fn freeze(resources: Vec<Resource>, binds: Vec<Bind>) -> Self {
        let mut by_id = HashMap::with_capacity(resources.len());
        let mut by_name = HashMap::with_capacity(resources.len());
        for (i, res) in resources.iter().enumerate() {
            by_id.insert(res.id.clone(), i);
            // Names are only unique per kind: an endpoint and a topic may
            // legally share one.
            by_name.insert((res.package.clone(), res.name.clone(), res.kind()), i);
        }
        Self {
            resources,
            binds,
            by_id,
            by_name,
        }
    }

    /// All resources, in deterministic registration order.
    pub fn resources(&self) -> &[Resource] {
        &self.resources
    }

    /// All binds.
    pub fn binds(&self) -> &[Bind] {
        &self.binds
    }

    /// Look up a resource by id.
    pub fn get(&self, id: &ResourceId) -> Option<&Resource> {
        self.by_id.get(id).map(|&i| &self.resources[i])
    }

    /// Look up a resource by (package, declared name, kind).
    pub fn lookup(&self, package: &str, name: &str, kind: ResourceKind) -> Option<&Resource> {
        self.by_name
            .get(&(package.to_string(), name.to_string(), kind))
            .map(|&i| &self.resources[i])
    }

    /// Resolve a symbolic endpoint reference to its endpoint resource.
    ///
    /// Resolution goes through the id, so same-named resources of other
    /// kinds can never satisfy (or shadow) an endpoint reference.
    pub fn resolve_endpoint(&self, endpoint: &EndpointRef) -> Option<&Resource> {
        self.get(&ResourceId::named(
            ResourceKind::ApiEndpoint,
            &endpoint.package,
            &endpoint.name,
        ))
    }

    /// All resources of one kind.
    pub fn of_kind(&self, kind: ResourceKind) -> impl Iterator<Item = &Resource> {
        self.resources.iter().filter(move |r| r.kind() == kind)
    }
}
