//! Cron job discovery from `cron.NewJob` initializers.
//!
//! A cron job construction is legal only as the sole initializer of a
//! package-level variable; the same expression anywhere else is an error.
//! The referenced endpoint stays symbolic here and is resolved against the
//! finished graph by the post-barrier rules.

use quarry_diag::Diagnostic;
use quarry_graph::{
    Bind, BindKind, BindTarget, CronJob, CronSchedule, EndpointRef, Resource, ResourceData,
    ResourceId, ResourceKind,
};

use crate::codes;
use crate::pass::{Pass, ScannedSource};
use crate::syntax::{ArgValue, CallExpr, Decl};

const CONSTRUCTOR: &str = "cron.NewJob";

pub fn run(pass: &Pass<'_>) {
    for src in pass.sources {
        for call in &src.output.body_calls {
            if call.callee == CONSTRUCTOR {
                pass.diags.add(
                    Diagnostic::error(
                        codes::CRON_ILLEGAL_CALL_SITE,
                        "cron job constructed outside a package-level variable",
                        call.span.clone(),
                    )
                    .with_label("constructed here")
                    .with_source(src.source.clone())
                    .with_hint(
                        "cron jobs must be the sole initializer of a package-level 'var'",
                    )
                    .with_doc(pass.docs_url("primitives/cron-jobs")),
                );
            }
        }

        for item in &src.output.items {
            let Decl::Var(var) = &item.decl else { continue };
            let Some(call) = &var.init else { continue };
            if call.callee != CONSTRUCTOR {
                continue;
            }
            job(pass, src, item.doc.clone(), var, call);
        }
    }
}

fn job(
    pass: &Pass<'_>,
    src: &ScannedSource,
    doc: Option<String>,
    var: &crate::syntax::VarDecl,
    call: &CallExpr,
) {
    let source = &src.source;
    let fail = |diag: Diagnostic| {
        pass.diags
            .add(diag.with_source(source.clone()).with_doc(pass.docs_url("primitives/cron-jobs")));
    };

    let Some(name_arg) = call.positional(0) else {
        fail(
            Diagnostic::error(
                codes::INVALID_CALL_OPTION,
                "cron job is missing its name",
                call.span.clone(),
            )
            .with_hint("the first argument is the job name as a string literal"),
        );
        return;
    };
    let ArgValue::Str(name) = &name_arg.value else {
        fail(
            Diagnostic::error(
                codes::INVALID_CALL_OPTION,
                "cron job name must be a string literal",
                name_arg.span.clone(),
            ),
        );
        return;
    };

    let mut ok = true;
    for arg in &call.args {
        let known = match arg.key.as_deref() {
            Some("title" | "every" | "schedule" | "endpoint") => true,
            Some(_) => false,
            None => std::ptr::eq(arg, name_arg),
        };
        if !known {
            fail(Diagnostic::error(
                codes::INVALID_CALL_OPTION,
                format!("unknown cron job option '{}'", arg.value.as_str()),
                arg.span.clone(),
            ));
            ok = false;
        }
    }

    let title = call.get("title").and_then(|a| match &a.value {
        ArgValue::Str(s) => Some(s.clone()),
        ArgValue::Word(_) => None,
    });

    let every = call.get("every");
    let schedule_arg = call.get("schedule");
    let schedule = match (every, schedule_arg) {
        (Some(arg), None) => match parse_every(arg.value.as_str()) {
            Ok(minutes) => Some(CronSchedule::Every(minutes)),
            Err(msg) => {
                fail(
                    Diagnostic::error(codes::INVALID_CRON_SCHEDULE, msg, arg.span.clone())
                        .with_hint("'every' takes a duration in whole minutes, at most 24h"),
                );
                None
            }
        },
        (None, Some(arg)) => {
            let expr = arg.value.as_str();
            if expr.split_whitespace().count() == 5 {
                Some(CronSchedule::Cron(expr.to_string()))
            } else {
                fail(
                    Diagnostic::error(
                        codes::INVALID_CRON_SCHEDULE,
                        format!("invalid cron expression '{expr}'"),
                        arg.span.clone(),
                    )
                    .with_hint("cron expressions have five fields: minute hour day month weekday"),
                );
                None
            }
        }
        (Some(_), Some(arg)) => {
            fail(
                Diagnostic::error(
                    codes::INVALID_CRON_SCHEDULE,
                    "cron job sets both 'every' and 'schedule'",
                    arg.span.clone(),
                )
                .with_hint("set exactly one of 'every' and 'schedule'"),
            );
            None
        }
        (None, None) => {
            fail(
                Diagnostic::error(
                    codes::INVALID_CRON_SCHEDULE,
                    "cron job has no schedule",
                    call.span.clone(),
                )
                .with_hint("set exactly one of 'every' and 'schedule'"),
            );
            None
        }
    };

    let endpoint = match call.get("endpoint") {
        Some(arg) => match endpoint_ref(&pass.pkg.name, arg.value.as_str()) {
            Some(endpoint) => Some((endpoint, arg.span.clone())),
            None => {
                fail(Diagnostic::error(
                    codes::INVALID_CALL_OPTION,
                    format!("invalid endpoint reference '{}'", arg.value.as_str()),
                    arg.span.clone(),
                ));
                None
            }
        },
        None => {
            fail(
                Diagnostic::error(
                    codes::INVALID_CALL_OPTION,
                    "cron job is missing 'endpoint'",
                    call.span.clone(),
                )
                .with_hint("name the endpoint to invoke, e.g. endpoint=SendWelcome"),
            );
            None
        }
    };

    let (Some(schedule), Some((endpoint, endpoint_span)), true) = (schedule, endpoint, ok) else {
        return;
    };

    let id = ResourceId::named(ResourceKind::CronJob, &pass.pkg.name, name);
    let resource = Resource {
        id: id.clone(),
        name: name.clone(),
        cloud_name: None,
        package: pass.pkg.name.clone(),
        doc,
        range: var.span.clone(),
        data: ResourceData::CronJob(CronJob {
            title,
            schedule,
            endpoint: endpoint.clone(),
        }),
    };
    if pass.registry.register(resource) {
        pass.registry.add_bind(Bind {
            target: BindTarget::Id(id),
            site: var.name_span.clone(),
            kind: BindKind::Create,
        });
        pass.registry.add_bind(Bind {
            target: BindTarget::Endpoint(endpoint),
            site: endpoint_span,
            kind: BindKind::Reference,
        });
    }
}

/// Resolve `Name` or `pkg.Name` to a symbolic endpoint reference.
pub(crate) fn endpoint_ref(own_package: &str, text: &str) -> Option<EndpointRef> {
    let parts: Vec<&str> = text.split('.').collect();
    let (package, name) = match parts.as_slice() {
        [name] => (own_package, *name),
        [package, name] => (*package, *name),
        _ => return None,
    };
    let ident = |s: &str| {
        !s.is_empty()
            && s.chars().all(|c| c.is_ascii_alphanumeric() || c == '_')
    };
    if !ident(package) || !ident(name) {
        return None;
    }
    Some(EndpointRef {
        package: package.to_string(),
        name: name.to_string(),
    })
}

/// Parse an `every` duration (`30m`, `2h`, `1h30m`) into whole minutes.
///
/// Seconds are accepted in the syntax but the total must land on a minute
/// boundary and fit within 24 hours.
fn parse_every(text: &str) -> Result<u32, String> {
    let mut seconds: u64 = 0;
    let mut digits = String::new();
    let mut any = false;
    for c in text.chars() {
        if c.is_ascii_digit() {
            digits.push(c);
        } else {
            let value: u64 = digits
                .parse()
                .map_err(|_| format!("invalid duration '{text}'"))?;
            digits.clear();
            any = true;
            seconds += match c {
                'h' => value * 3600,
                'm' => value * 60,
                's' => value,
                _ => return Err(format!("invalid duration '{text}'")),
            };
        }
    }
    if !any || !digits.is_empty() {
        return Err(format!("invalid duration '{text}'"));
    }
    if seconds == 0 || seconds % 60 != 0 {
        return Err(format!("'every' must be a whole number of minutes, got '{text}'"));
    }
    if seconds > 24 * 3600 {
        return Err(format!("'every' must be at most 24 hours, got '{text}'"));
    }
    Ok((seconds / 60) as u32)
}
