//! Post-barrier validation rules.
//!
//! Rules run once, after every package has finished discovery, so they see
//! the complete resource and bind sets. They only read; all reporting goes
//! through the shared sink.

use std::collections::HashMap;
use std::sync::Arc;

use quarry_diag::{Diagnostic, DiagnosticSink};
use quarry_graph::{Bind, BindKind, BindTarget, Resource, ResourceId, ResourceKind};

use crate::codes;

/// Read-only view of a completed discovery pass.
pub struct RuleContext<'a> {
    pub resources: &'a [Resource],
    pub binds: &'a [Bind],
    pub diags: &'a DiagnosticSink,
    pub docs_base_url: &'a str,
    /// Source contents by app-root-relative path, for rendering windows.
    pub sources: &'a HashMap<String, Arc<str>>,
    by_id: HashMap<ResourceId, &'a Resource>,
}

impl<'a> RuleContext<'a> {
    pub fn new(
        resources: &'a [Resource],
        binds: &'a [Bind],
        diags: &'a DiagnosticSink,
        docs_base_url: &'a str,
        sources: &'a HashMap<String, Arc<str>>,
    ) -> Self {
        let by_id = resources.iter().map(|r| (r.id.clone(), r)).collect();
        Self {
            resources,
            binds,
            diags,
            docs_base_url,
            sources,
            by_id,
        }
    }

    /// The endpoint resource a symbolic reference points at, if any.
    ///
    /// Resolution goes through the endpoint id, so a same-named resource of
    /// another kind can never shadow a real endpoint.
    fn endpoint(&self, package: &str, name: &str) -> Option<&Resource> {
        let id = ResourceId::named(ResourceKind::ApiEndpoint, package, name);
        self.by_id.get(&id).copied()
    }

    fn report(&self, diag: Diagnostic) {
        let diag = match diag.primary_span().and_then(|s| self.sources.get(&s.path)) {
            Some(source) => diag.with_source(source.clone()),
            None => diag,
        };
        self.diags.add(diag);
    }

    fn docs_url(&self, topic: &str) -> String {
        format!("{}/{}", self.docs_base_url.trim_end_matches('/'), topic)
    }
}

/// A validation rule over the completed pass.
pub trait Rule: Sync {
    fn name(&self) -> &'static str;
    fn check(&self, ctx: &RuleContext<'_>);
}

/// All rules, run in order after the barrier.
pub fn rules() -> Vec<Box<dyn Rule>> {
    vec![Box::new(EndpointResolution), Box::new(EndpointCalls)]
}

/// Every explicit endpoint reference (cron jobs, subscription handlers)
/// must resolve to a registered API endpoint.
struct EndpointResolution;

impl Rule for EndpointResolution {
    fn name(&self) -> &'static str {
        "endpoint-resolution"
    }

    fn check(&self, ctx: &RuleContext<'_>) {
        for bind in ctx.binds {
            if bind.kind != BindKind::Reference {
                continue;
            }
            let BindTarget::Endpoint(endpoint) = &bind.target else {
                continue;
            };
            if ctx.endpoint(&endpoint.package, &endpoint.name).is_none() {
                ctx.report(
                    Diagnostic::error(
                        codes::UNKNOWN_ENDPOINT,
                        format!("unknown endpoint {endpoint}"),
                        bind.site.clone(),
                    )
                    .with_label("referenced here")
                    .with_hint("the reference must name an endpoint declared with an api directive")
                    .with_doc(ctx.docs_url("primitives/apis")),
                );
            }
        }
    }
}

/// Endpoints are invoked by the platform, never as plain function calls.
struct EndpointCalls;

impl Rule for EndpointCalls {
    fn name(&self) -> &'static str {
        "endpoint-calls"
    }

    fn check(&self, ctx: &RuleContext<'_>) {
        for bind in ctx.binds {
            if bind.kind != BindKind::Call {
                continue;
            }
            let BindTarget::Endpoint(endpoint) = &bind.target else {
                continue;
            };
            // Calls that do not land on an endpoint are ordinary function
            // calls and none of our business.
            if ctx.endpoint(&endpoint.package, &endpoint.name).is_some() {
                ctx.report(
                    Diagnostic::error(
                        codes::ENDPOINT_CALLED,
                        "endpoint called directly",
                        bind.site.clone(),
                    )
                    .with_label(format!("{endpoint} called here"))
                    .with_hint(
                        "endpoints may only be referenced, not called, except as a job or \
                         subscription handler",
                    )
                    .with_doc(ctx.docs_url("primitives/apis")),
                );
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use quarry_core::Span;
    use quarry_graph::{
        ApiEndpoint, DeliveryGuarantee, EndpointRef, PathSegment, PathTemplate, PubSubTopic,
        ResourceData, ResourceId, Transport, Visibility,
    };

    use super::*;

    fn endpoint(package: &str, name: &str) -> Resource {
        Resource {
            id: ResourceId::named(ResourceKind::ApiEndpoint, package, name),
            name: name.to_string(),
            cloud_name: None,
            package: package.to_string(),
            doc: None,
            range: Span::file(format!("{package}/api.qy")),
            data: ResourceData::ApiEndpoint(ApiEndpoint {
                path: PathTemplate {
                    segments: vec![PathSegment::Literal(name.to_lowercase())],
                },
                methods: vec!["*".to_string()],
                visibility: Visibility::Private,
                transport: Transport::Typed,
                path_params: Vec::new(),
            }),
        }
    }

    fn reference(package: &str, name: &str, kind: BindKind) -> Bind {
        Bind {
            target: BindTarget::Endpoint(EndpointRef {
                package: package.to_string(),
                name: name.to_string(),
            }),
            site: Span::new(format!("{package}/cron.qy"), 10, 20),
            kind,
        }
    }

    fn run_rules(resources: &[Resource], binds: &[Bind]) -> Vec<Diagnostic> {
        let diags = DiagnosticSink::new();
        let sources = HashMap::new();
        let ctx = RuleContext::new(resources, binds, &diags, "https://quarry.dev/docs", &sources);
        for rule in rules() {
            rule.check(&ctx);
        }
        diags.into_sorted()
    }

    fn topic(package: &str, name: &str) -> Resource {
        Resource {
            id: ResourceId::named(ResourceKind::PubSubTopic, package, name),
            name: name.to_string(),
            cloud_name: None,
            package: package.to_string(),
            doc: None,
            range: Span::file(format!("{package}/pubsub.qy")),
            data: ResourceData::PubSubTopic(PubSubTopic {
                message_type: "Message".to_string(),
                delivery: DeliveryGuarantee::AtLeastOnce,
            }),
        }
    }

    #[test]
    fn test_reference_to_known_endpoint_is_fine() {
        let resources = vec![endpoint("blog", "SendWelcome")];
        let binds = vec![reference("blog", "SendWelcome", BindKind::Reference)];
        assert!(run_rules(&resources, &binds).is_empty());
    }

    #[test]
    fn test_topic_sharing_the_endpoint_name_does_not_shadow_it() {
        let resources = vec![
            endpoint("blog", "SendWelcome"),
            topic("blog", "SendWelcome"),
        ];
        let binds = vec![reference("blog", "SendWelcome", BindKind::Reference)];
        assert!(run_rules(&resources, &binds).is_empty());
    }

    #[test]
    fn test_reference_to_unknown_endpoint() {
        let binds = vec![reference("blog", "Missing", BindKind::Reference)];
        let diags = run_rules(&[], &binds);
        assert_eq!(diags.len(), 1);
        assert_eq!(diags[0].code, codes::UNKNOWN_ENDPOINT);
        assert!(diags[0].message.contains("blog.Missing"));
    }

    #[test]
    fn test_direct_endpoint_call_rejected() {
        let resources = vec![endpoint("blog", "SendWelcome")];
        let binds = vec![reference("blog", "SendWelcome", BindKind::Call)];
        let diags = run_rules(&resources, &binds);
        assert_eq!(diags.len(), 1);
        assert_eq!(diags[0].code, codes::ENDPOINT_CALLED);
        assert_eq!(diags[0].message, "endpoint called directly");
    }

    #[test]
    fn test_call_to_plain_function_ignored() {
        let binds = vec![reference("blog", "helper", BindKind::Call)];
        assert!(run_rules(&[], &binds).is_empty());
    }
}
