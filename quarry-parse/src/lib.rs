//! Resource discovery and validation.
//!
//! This crate turns an application's source tree into a validated
//! [`ResourceGraph`](quarry_graph::ResourceGraph): it scans directive
//! comments and declarations, runs one resource parser per family
//! (endpoints, databases, pub/sub, cron, gateways, storage), enforces the
//! global invariants after all packages complete, and renders a
//! deterministic diagnostic report when anything is wrong.
//!
//! The entry point is [`run_discovery`].

pub mod codes;
mod directive;
mod error;
mod parsers;
mod pass;
mod run;
mod syntax;
mod validate;

pub use directive::{CommentLine, Directive, DirectiveIssue, DirectiveToken, parse_comment};
pub use error::{DiscoveryError, FatalError};
pub use parsers::{PARSERS, ResourceParser};
pub use pass::{CancelToken, Pass, ResourceRegistry, ScannedSource};
pub use run::{DiscoveryConfig, run_discovery, run_discovery_with_cancel};
pub use syntax::{
    ArgValue, CallArg, CallExpr, Decl, FuncDecl, Param, ScanOutput, SourceItem, VarDecl, scan_file,
};
pub use validate::{Rule, RuleContext, rules};
