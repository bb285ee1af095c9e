//! Object storage buckets and application secrets.
//!
//! Both are structural decodes: `objects.NewBucket("name", versioned)` and
//! `secrets.Secret(Name)` carry no validation beyond their argument shape.

use quarry_diag::Diagnostic;
use quarry_graph::{
    Bind, BindKind, BindTarget, Bucket, Resource, ResourceData, ResourceId, ResourceKind, Secret,
};

use crate::codes;
use crate::pass::{Pass, ScannedSource};
use crate::syntax::{ArgValue, CallExpr, Decl, VarDecl};

pub fn run(pass: &Pass<'_>) {
    for src in pass.sources {
        for item in &src.output.items {
            let Decl::Var(var) = &item.decl else { continue };
            let Some(call) = &var.init else { continue };
            match call.callee.as_str() {
                "objects.NewBucket" => bucket(pass, src, item.doc.clone(), var, call),
                "secrets.Secret" => secret(pass, src, item.doc.clone(), var, call),
                _ => {}
            }
        }
    }
}

fn bucket(
    pass: &Pass<'_>,
    src: &ScannedSource,
    doc: Option<String>,
    var: &VarDecl,
    call: &CallExpr,
) {
    let Some(ArgValue::Str(name)) = call.positional(0).map(|a| &a.value) else {
        pass.diags.add(
            Diagnostic::error(
                codes::INVALID_CALL_OPTION,
                "bucket is missing its name",
                call.span.clone(),
            )
            .with_source(src.source.clone())
            .with_hint("the first argument is the bucket name as a string literal")
            .with_doc(pass.docs_url("primitives/object-storage")),
        );
        return;
    };
    let name = name.clone();

    let id = ResourceId::named(ResourceKind::Bucket, &pass.pkg.name, &name);
    let resource = Resource {
        id: id.clone(),
        name,
        cloud_name: call.get("cloud_name").map(|a| a.value.as_str().to_string()),
        package: pass.pkg.name.clone(),
        doc,
        range: var.span.clone(),
        data: ResourceData::Bucket(Bucket {
            versioned: call.has_flag("versioned"),
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

fn secret(
    pass: &Pass<'_>,
    src: &ScannedSource,
    doc: Option<String>,
    var: &VarDecl,
    call: &CallExpr,
) {
    let Some(key) = call.positional(0).map(|a| a.value.as_str().to_string()) else {
        pass.diags.add(
            Diagnostic::error(
                codes::INVALID_CALL_OPTION,
                "secret is missing its key",
                call.span.clone(),
            )
            .with_source(src.source.clone())
            .with_hint("name the secret key, e.g. secrets.Secret(GithubToken)")
            .with_doc(pass.docs_url("primitives/secrets")),
        );
        return;
    };

    let id = ResourceId::named(ResourceKind::Secret, &pass.pkg.name, &key);
    let resource = Resource {
        id: id.clone(),
        name: key.clone(),
        cloud_name: None,
        package: pass.pkg.name.clone(),
        doc,
        range: var.span.clone(),
        data: ResourceData::Secret(Secret { key }),
    };
    if pass.registry.register(resource) {
        pass.registry.add_bind(Bind {
            target: BindTarget::Id(id),
            site: var.name_span.clone(),
            kind: BindKind::Create,
        });
    }
}
