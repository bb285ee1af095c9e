//! Gateway discovery and CORS policy decoding.
//!
//! The decode is structural only; actual CORS enforcement happens at the
//! network layer. The one semantic check: credentialed cross-origin access
//! comes from exactly one of an explicit origin allow-list or the
//! unsafe-allow-all flag.

use quarry_diag::Diagnostic;
use quarry_graph::{
    Bind, BindKind, BindTarget, CorsPolicy, Gateway, Resource, ResourceData, ResourceId,
    ResourceKind,
};

use crate::codes;
use crate::pass::{Pass, ScannedSource};
use crate::syntax::{ArgValue, CallExpr, Decl, VarDecl};

pub fn run(pass: &Pass<'_>) {
    for src in pass.sources {
        for item in &src.output.items {
            let Decl::Var(var) = &item.decl else { continue };
            let Some(call) = &var.init else { continue };
            if call.callee == "gateway.New" {
                gateway(pass, src, item.doc.clone(), var, call);
            }
        }
    }
}

fn gateway(
    pass: &Pass<'_>,
    src: &ScannedSource,
    doc: Option<String>,
    var: &VarDecl,
    call: &CallExpr,
) {
    let fail = |diag: Diagnostic| {
        pass.diags
            .add(diag.with_source(src.source.clone()).with_doc(pass.docs_url("primitives/gateways")));
    };

    let Some(ArgValue::Str(name)) = call.positional(0).map(|a| &a.value) else {
        fail(
            Diagnostic::error(
                codes::INVALID_CALL_OPTION,
                "gateway is missing its name",
                call.span.clone(),
            )
            .with_hint("the first argument is the gateway name as a string literal"),
        );
        return;
    };
    let name = name.clone();

    let allow_with = call.get("allow_origins_with_credentials");
    let unsafe_all = call
        .args
        .iter()
        .find(|a| {
            a.key.is_none()
                && a.value == ArgValue::Word("allow_unsafe_all_origins_with_credentials".into())
        });

    if let (Some(list_arg), Some(flag_arg)) = (allow_with, unsafe_all) {
        pass.diags.add(
            Diagnostic::error(
                codes::INVALID_CORS,
                "gateway sets both a credentialed origin allow-list and unsafe-allow-all",
                list_arg.span.clone(),
            )
            .with_label("allow-list set here")
            .with_source(src.source.clone())
            .with_annotation(
                flag_arg.span.clone(),
                "unsafe-allow-all set here",
                Some(src.source.clone()),
            )
            .with_hint("credentialed access uses exactly one of the two; remove one")
            .with_doc(pass.docs_url("primitives/gateways")),
        );
        return;
    }

    let cors = CorsPolicy {
        debug: call.has_flag("cors_debug"),
        allow_origins_with_credentials: allow_with.map(|a| split_list(a.value.as_str())),
        allow_unsafe_all_origins_with_credentials: unsafe_all.is_some(),
        allow_origins_without_credentials: call
            .get("allow_origins_without_credentials")
            .map(|a| split_list(a.value.as_str())),
        extra_allowed_headers: call
            .get("extra_allowed_headers")
            .map(|a| split_list(a.value.as_str()))
            .unwrap_or_default(),
        extra_exposed_headers: call
            .get("extra_exposed_headers")
            .map(|a| split_list(a.value.as_str()))
            .unwrap_or_default(),
        allow_private_network_access: call.has_flag("allow_private_network_access"),
    };

    let id = ResourceId::named(ResourceKind::Gateway, &pass.pkg.name, &name);
    let resource = Resource {
        id: id.clone(),
        name,
        cloud_name: None,
        package: pass.pkg.name.clone(),
        doc,
        range: var.span.clone(),
        data: ResourceData::Gateway(Gateway {
            base_url: call.get("base_url").map(|a| a.value.as_str().to_string()),
            hostnames: call
                .get("hostnames")
                .map(|a| split_list(a.value.as_str()))
                .unwrap_or_default(),
            cors,
        }),
    };
    if pass.registry.register(resource) {
        pass.registry.add_bind(Bind {
            target: BindTarget::Id(id),
            site: var.name_span.clone(),
            kind: BindKind::Create,
        });
    }
}

fn split_list(text: &str) -> Vec<String> {
    text.split(',')
        .map(|s| s.trim())
        .filter(|s| !s.is_empty())
        .map(String::from)
        .collect()
}
