//! API endpoint discovery from `//quarry:api` directives.

use quarry_core::Span;
use quarry_diag::Diagnostic;
use quarry_graph::{
    ApiEndpoint, Bind, BindKind, BindTarget, EndpointRef, PathSegment, PathTemplate, Resource,
    ResourceData, ResourceId, ResourceKind, Transport, Visibility,
};

use crate::codes;
use crate::directive::Directive;
use crate::pass::Pass;
use crate::syntax::{Decl, FuncDecl, SourceItem};

const METHODS: &[&str] = &["GET", "POST", "PUT", "DELETE", "PATCH", "HEAD", "OPTIONS", "*"];

/// Dotted-call namespaces that construct resources rather than call code.
const CONSTRUCTOR_NAMESPACES: &[&str] = &["cron", "pubsub", "gateway", "objects", "secrets"];

const SIGNATURE_HINT: &str = "valid endpoint signatures are 'func(ctx Context) error', \
     'func(ctx Context) (*Response, error)', 'func(ctx Context, p *Request) error', and \
     'func(ctx Context, p *Request) (*Response, error)', optionally with plain path \
     parameters after the context";

pub fn run(pass: &Pass<'_>) {
    for src in pass.sources {
        for item in &src.output.items {
            if let Some(directive) = item.directives.iter().find(|d| d.kind == "api") {
                endpoint(pass, src.source.clone(), item, directive);
            }
        }
        record_call_sites(pass, src);
    }
}

/// Record every plain call in function bodies, and every package-level var
/// initializer call, as a potential endpoint call.
///
/// Most of these are ordinary helper calls that never resolve to a resource;
/// the post-barrier rules discard those. Calls into constructor namespaces
/// are handled by their own parsers and skipped here.
fn record_call_sites(pass: &Pass<'_>, src: &crate::pass::ScannedSource) {
    let initializers = src.output.items.iter().filter_map(|item| match &item.decl {
        Decl::Var(var) => var.init.as_ref(),
        Decl::Func(_) => None,
    });
    for call in src.output.body_calls.iter().chain(initializers) {
        let parts: Vec<&str> = call.callee.split('.').collect();
        let target = match parts.as_slice() {
            [name] => EndpointRef {
                package: pass.pkg.name.clone(),
                name: (*name).to_string(),
            },
            [ns, name] if !CONSTRUCTOR_NAMESPACES.contains(ns) => EndpointRef {
                package: (*ns).to_string(),
                name: (*name).to_string(),
            },
            _ => continue,
        };
        pass.registry.add_bind(Bind {
            target: BindTarget::Endpoint(target),
            site: call.span.clone(),
            kind: BindKind::Call,
        });
    }
}

fn endpoint(
    pass: &Pass<'_>,
    source: std::sync::Arc<str>,
    item: &SourceItem,
    directive: &Directive,
) {
    let Decl::Func(func) = &item.decl else {
        pass.diags.add(
            Diagnostic::error(
                codes::INVALID_DIRECTIVE,
                "api directive must be attached to a function declaration",
                directive.span.clone(),
            )
            .with_source(source)
            .with_doc(pass.docs_url("primitives/apis")),
        );
        return;
    };

    let mut ok = check_tokens(pass, &source, directive);

    let visibility = if directive.has_flag("public") {
        Visibility::Public
    } else {
        Visibility::Private
    };
    let transport = if directive.has_flag("raw") {
        Transport::Raw
    } else {
        Transport::Typed
    };

    if transport == Transport::Raw && visibility == Visibility::Private {
        let span = directive.flag_span("raw").unwrap_or_else(|| directive.span.clone());
        pass.diags.add(
            Diagnostic::error(codes::RAW_ENDPOINT_PRIVATE, "raw endpoint is private", span)
                .with_label("declared raw here")
                .with_source(source.clone())
                .with_hint("raw endpoints must be public")
                .with_doc(pass.docs_url("primitives/raw-endpoints")),
        );
        ok = false;
    }

    let path_params = match signature_params(func) {
        Some(params) => params,
        None => {
            pass.diags.add(
                Diagnostic::error(
                    codes::INVALID_ENDPOINT_SIGNATURE,
                    format!("invalid signature for endpoint {}", func.name),
                    func.params_span.clone(),
                )
                .with_source(source.clone())
                .with_hint(SIGNATURE_HINT)
                .with_doc(pass.docs_url("primitives/apis")),
            );
            return;
        }
    };

    let (path, path_span) = match directive.get("path") {
        Some(text) => {
            let span = directive
                .value_span("path")
                .unwrap_or_else(|| directive.span.clone());
            match parse_path(text, &span) {
                Ok(path) => (path, span),
                Err(diag) => {
                    pass.diags
                        .add(diag.with_source(source).with_doc(pass.docs_url("primitives/apis")));
                    return;
                }
            }
        }
        None => (
            PathTemplate {
                segments: vec![PathSegment::Literal(format!(
                    "{}.{}",
                    pass.pkg.name, func.name
                ))],
            },
            directive.span.clone(),
        ),
    };

    let methods = match directive.get("method") {
        Some(text) => {
            let span = directive
                .value_span("method")
                .unwrap_or_else(|| directive.span.clone());
            match parse_methods(text, &span) {
                Ok(methods) => methods,
                Err(diag) => {
                    pass.diags
                        .add(diag.with_source(source).with_doc(pass.docs_url("primitives/apis")));
                    return;
                }
            }
        }
        None => vec!["*".to_string()],
    };

    // The named segments and the handler's path-bound parameters must be
    // the same set; order differences are fine.
    let mut declared: Vec<&str> = path.param_names();
    let mut bound: Vec<&str> = path_params.iter().map(|s| s.as_str()).collect();
    declared.sort_unstable();
    bound.sort_unstable();
    if declared != bound {
        pass.diags.add(
            Diagnostic::error(
                codes::PATH_PARAM_MISMATCH,
                format!("endpoint {} path parameters do not match its handler", func.name),
                path_span,
            )
            .with_label(format!("path declares {}", name_set(&declared)))
            .with_source(source.clone())
            .with_annotation(
                func.params_span.clone(),
                format!("handler binds {}", name_set(&bound)),
                Some(source.clone()),
            )
            .with_hint("every ':name' segment needs a matching plain parameter, and vice versa")
            .with_doc(pass.docs_url("primitives/apis")),
        );
        ok = false;
    }

    if !ok {
        return;
    }

    let id = ResourceId::named(ResourceKind::ApiEndpoint, &pass.pkg.name, &func.name);
    let resource = Resource {
        id: id.clone(),
        name: func.name.clone(),
        cloud_name: None,
        package: pass.pkg.name.clone(),
        doc: item.doc.clone(),
        range: func.span.clone(),
        data: ResourceData::ApiEndpoint(ApiEndpoint {
            path,
            methods,
            visibility,
            transport,
            path_params,
        }),
    };
    if pass.registry.register(resource) {
        pass.registry.add_bind(Bind {
            target: BindTarget::Id(id),
            site: func.name_span.clone(),
            kind: BindKind::Create,
        });
    }
}

/// Validate the directive's token set. Returns false if anything is off.
fn check_tokens(pass: &Pass<'_>, source: &std::sync::Arc<str>, directive: &Directive) -> bool {
    let mut ok = true;
    for token in &directive.tokens {
        let valid = match token.value {
            Some(_) => matches!(token.key.as_str(), "path" | "method"),
            None => matches!(token.key.as_str(), "public" | "private" | "raw"),
        };
        if !valid {
            pass.diags.add(
                Diagnostic::error(
                    codes::INVALID_DIRECTIVE,
                    format!("unknown api directive option '{}'", token.key),
                    token.span.clone(),
                )
                .with_source(source.clone())
                .with_doc(pass.docs_url("primitives/apis")),
            );
            ok = false;
        }
    }
    if directive.has_flag("public") && directive.has_flag("private") {
        pass.diags.add(
            Diagnostic::error(
                codes::INVALID_DIRECTIVE,
                "endpoint cannot be both public and private",
                directive.span.clone(),
            )
            .with_source(source.clone()),
        );
        ok = false;
    }
    ok
}

/// Check the handler signature and extract the path-bound parameter names.
///
/// Accepted shape: a leading `Context` parameter, then zero or more plain
/// (non-pointer) path parameters, then an optional trailing pointer request
/// parameter. Results must be `error` alone or `(*Response, error)`.
fn signature_params(func: &FuncDecl) -> Option<Vec<String>> {
    let (first, rest) = func.params.split_first()?;
    if first.pointer || first.ty != "Context" {
        return None;
    }

    let mut path_params = Vec::new();
    let mut params = rest.iter().peekable();
    while let Some(param) = params.next() {
        if param.pointer {
            // The request payload must be last.
            if params.peek().is_some() {
                return None;
            }
        } else {
            path_params.push(param.name.clone());
        }
    }

    match func.results.as_slice() {
        [err] if err == "error" => {}
        [resp, err] if err == "error" && resp.starts_with('*') => {}
        _ => return None,
    }
    Some(path_params)
}

/// Parse a `/seg/:param/...` path template. Segment errors are anchored on
/// the offending segment inside the directive token.
fn parse_path(text: &str, span: &Span) -> Result<PathTemplate, Diagnostic> {
    let Some(rest) = text.strip_prefix('/') else {
        return Err(Diagnostic::error(
            codes::INVALID_ENDPOINT_PATH,
            "endpoint path must start with '/'",
            span.clone(),
        ));
    };

    let mut segments = Vec::new();
    let mut offset = 1;
    for raw in rest.split('/') {
        let seg_span = Span::new(
            span.path.clone(),
            span.start + offset,
            span.start + offset + raw.len().max(1),
        );
        offset += raw.len() + 1;

        if raw.is_empty() {
            return Err(Diagnostic::error(
                codes::INVALID_ENDPOINT_PATH,
                "endpoint path has an empty segment",
                seg_span,
            ));
        }
        if let Some(name) = raw.strip_prefix(':') {
            let valid = !name.is_empty()
                && name.chars().all(|c| c.is_ascii_alphanumeric() || c == '_');
            if !valid {
                return Err(Diagnostic::error(
                    codes::INVALID_ENDPOINT_PATH,
                    format!("invalid path parameter ':{name}'"),
                    seg_span,
                )
                .with_hint("path parameters are ':name' with an identifier name"));
            }
            segments.push(PathSegment::Param(name.to_string()));
        } else {
            segments.push(PathSegment::Literal(raw.to_string()));
        }
    }
    Ok(PathTemplate { segments })
}

fn parse_methods(text: &str, span: &Span) -> Result<Vec<String>, Diagnostic> {
    let mut methods = Vec::new();
    for method in text.split(',') {
        if !METHODS.contains(&method) {
            return Err(Diagnostic::error(
                codes::INVALID_ENDPOINT_METHOD,
                format!("invalid HTTP method '{method}'"),
                span.clone(),
            )
            .with_hint("methods are uppercase HTTP method names or '*', comma-separated"));
        }
        methods.push(method.to_string());
    }
    Ok(methods)
}

fn name_set(names: &[&str]) -> String {
    if names.is_empty() {
        "no parameters".to_string()
    } else {
        names.join(", ")
    }
}
