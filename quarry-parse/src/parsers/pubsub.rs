//! Pub/sub topic and subscription discovery.

use quarry_diag::Diagnostic;
use quarry_graph::{
    Bind, BindKind, BindTarget, DeliveryGuarantee, PubSubSubscription, PubSubTopic, Resource,
    ResourceData, ResourceId, ResourceKind,
};

use crate::codes;
use crate::pass::{Pass, ScannedSource};
use crate::parsers::cron::endpoint_ref;
use crate::syntax::{ArgValue, CallExpr, Decl, VarDecl};

pub fn run(pass: &Pass<'_>) {
    for src in pass.sources {
        for item in &src.output.items {
            let Decl::Var(var) = &item.decl else { continue };
            let Some(call) = &var.init else { continue };
            match call.callee.as_str() {
                "pubsub.NewTopic" => topic(pass, src, item.doc.clone(), var, call),
                "pubsub.NewSubscription" => subscription(pass, src, item.doc.clone(), var, call),
                _ => {}
            }
        }
    }
}

fn topic(
    pass: &Pass<'_>,
    src: &ScannedSource,
    doc: Option<String>,
    var: &VarDecl,
    call: &CallExpr,
) {
    let fail = |diag: Diagnostic| {
        pass.diags
            .add(diag.with_source(src.source.clone()).with_doc(pass.docs_url("primitives/pubsub")));
    };

    let Some(name) = string_arg(call, 0) else {
        fail(
            Diagnostic::error(
                codes::INVALID_CALL_OPTION,
                "topic is missing its name",
                call.span.clone(),
            )
            .with_hint("the first argument is the topic name as a string literal"),
        );
        return;
    };

    let Some(message_type) = call.get("message").map(|a| a.value.as_str().to_string()) else {
        fail(
            Diagnostic::error(
                codes::INVALID_CALL_OPTION,
                "topic is missing 'message'",
                call.span.clone(),
            )
            .with_hint("name the message type carried by the topic, e.g. message=Signup"),
        );
        return;
    };

    let delivery = match call.get("delivery") {
        None => DeliveryGuarantee::AtLeastOnce,
        Some(arg) => match arg.value.as_str() {
            "at_least_once" => DeliveryGuarantee::AtLeastOnce,
            "exactly_once" => DeliveryGuarantee::ExactlyOnce,
            other => {
                fail(
                    Diagnostic::error(
                        codes::INVALID_CALL_OPTION,
                        format!("unknown delivery guarantee '{other}'"),
                        arg.span.clone(),
                    )
                    .with_hint("delivery is 'at_least_once' or 'exactly_once'"),
                );
                return;
            }
        },
    };

    let id = ResourceId::named(ResourceKind::PubSubTopic, &pass.pkg.name, &name);
    let resource = Resource {
        id: id.clone(),
        name,
        cloud_name: None,
        package: pass.pkg.name.clone(),
        doc,
        range: var.span.clone(),
        data: ResourceData::PubSubTopic(PubSubTopic {
            message_type,
            delivery,
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

fn subscription(
    pass: &Pass<'_>,
    src: &ScannedSource,
    doc: Option<String>,
    var: &VarDecl,
    call: &CallExpr,
) {
    let fail = |diag: Diagnostic| {
        pass.diags
            .add(diag.with_source(src.source.clone()).with_doc(pass.docs_url("primitives/pubsub")));
    };

    // First argument names the topic (the topic variable or its logical
    // name), second the subscription itself.
    let Some(topic_arg) = call.positional(0) else {
        fail(
            Diagnostic::error(
                codes::INVALID_CALL_OPTION,
                "subscription is missing its topic",
                call.span.clone(),
            )
            .with_hint("the first argument names the topic subscribed to"),
        );
        return;
    };
    let topic = topic_arg.value.as_str().to_string();

    let Some(name) = string_arg(call, 1) else {
        fail(
            Diagnostic::error(
                codes::INVALID_CALL_OPTION,
                "subscription is missing its name",
                call.span.clone(),
            )
            .with_hint("the second argument is the subscription name as a string literal"),
        );
        return;
    };

    let handler = match call.get("handler") {
        Some(arg) => match endpoint_ref(&pass.pkg.name, arg.value.as_str()) {
            Some(handler) => (handler, arg.span.clone()),
            None => {
                fail(Diagnostic::error(
                    codes::INVALID_CALL_OPTION,
                    format!("invalid handler reference '{}'", arg.value.as_str()),
                    arg.span.clone(),
                ));
                return;
            }
        },
        None => {
            fail(
                Diagnostic::error(
                    codes::INVALID_CALL_OPTION,
                    "subscription is missing 'handler'",
                    call.span.clone(),
                )
                .with_hint("name the endpoint handling deliveries, e.g. handler=OnSignup"),
            );
            return;
        }
    };

    let (handler, handler_span) = handler;
    let id = ResourceId::named(ResourceKind::PubSubSubscription, &pass.pkg.name, &name);
    let resource = Resource {
        id: id.clone(),
        name,
        cloud_name: None,
        package: pass.pkg.name.clone(),
        doc,
        range: var.span.clone(),
        data: ResourceData::PubSubSubscription(PubSubSubscription {
            topic,
            handler: handler.clone(),
        }),
    };
    if pass.registry.register(resource) {
        pass.registry.add_bind(Bind {
            target: BindTarget::Id(id),
            site: var.name_span.clone(),
            kind: BindKind::Create,
        });
        pass.registry.add_bind(Bind {
            target: BindTarget::Endpoint(handler),
            site: handler_span,
            kind: BindKind::Reference,
        });
    }
}

fn string_arg(call: &CallExpr, n: usize) -> Option<String> {
    match &call.positional(n)?.value {
        ArgValue::Str(s) => Some(s.clone()),
        ArgValue::Word(_) => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::syntax::scan_file;

    fn init(source: &str) -> CallExpr {
        let out = scan_file("quarry", "users/pubsub.qy", source);
        match &out.items[0].decl {
            Decl::Var(v) => v.init.clone().unwrap(),
            _ => panic!("expected var"),
        }
    }

    #[test]
    fn test_topic_arguments() {
        let call = init("var signups = pubsub.NewTopic(\"signups\", message=Signup)\n");
        assert_eq!(string_arg(&call, 0).as_deref(), Some("signups"));
        assert_eq!(call.get("message").unwrap().value.as_str(), "Signup");
    }

    #[test]
    fn test_subscription_arguments() {
        let call = init(
            "var welcome = pubsub.NewSubscription(signups, \"send-welcome\", handler=SendWelcome)\n",
        );
        assert_eq!(call.positional(0).unwrap().value.as_str(), "signups");
        assert_eq!(string_arg(&call, 1).as_deref(), Some("send-welcome"));
        assert_eq!(call.get("handler").unwrap().value.as_str(), "SendWelcome");
    }
}
