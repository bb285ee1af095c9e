//! Resource parsers.
//!
//! Each parser owns one family of resource declarations. Parsers run
//! independently over a package's scanned sources; they report problems to
//! the shared diagnostic sink and register what they find in the shared
//! registry. A parser never stops at the first problem.

mod api;
mod cron;
mod gateway;
mod pubsub;
mod sqldb;
mod storage;

use crate::pass::Pass;

/// A registered resource parser.
pub struct ResourceParser {
    pub name: &'static str,
    /// Subdirectory names that make a package interesting to this parser
    /// even when the package has no source files of its own.
    pub interesting_subdirs: &'static [&'static str],
    pub run: fn(&Pass<'_>),
}

/// All parsers, in a fixed order. Order does not affect the result; the
/// registry and sink are order-independent.
pub static PARSERS: &[ResourceParser] = &[
    ResourceParser {
        name: "api",
        interesting_subdirs: &[],
        run: api::run,
    },
    ResourceParser {
        name: "sqldb",
        interesting_subdirs: &["migrations"],
        run: sqldb::run,
    },
    ResourceParser {
        name: "pubsub",
        interesting_subdirs: &[],
        run: pubsub::run,
    },
    ResourceParser {
        name: "cron",
        interesting_subdirs: &[],
        run: cron::run,
    },
    ResourceParser {
        name: "gateway",
        interesting_subdirs: &[],
        run: gateway::run,
    },
    ResourceParser {
        name: "storage",
        interesting_subdirs: &[],
        run: storage::run,
    },
];
