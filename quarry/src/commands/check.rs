use std::path::PathBuf;

use clap::Args;
use eyre::{Context, Result};
use quarry_core::{AppRoot, QuarryToml, load_packages};
use quarry_graph::{ResourceGraph, ResourceKind};
use quarry_parse::{DiscoveryConfig, DiscoveryError, run_discovery};

use super::UnwrapOrExit;

#[derive(Args)]
pub struct CheckCommand {
    /// Application root directory (defaults to the current directory)
    #[arg(long, default_value = ".")]
    pub app_root: PathBuf,

    /// Print the discovered resource graph as JSON
    #[arg(long)]
    pub json: bool,
}

impl CheckCommand {
    pub fn run(&self) -> Result<()> {
        let (app_name, graph) = discover(&self.app_root)?;

        if self.json {
            println!("{}", serde_json::to_string_pretty(&graph)?);
            return Ok(());
        }

        println!("✓ {} is valid\n", app_name);
        for (kind, singular, plural) in KIND_LABELS {
            let count = graph.of_kind(*kind).count();
            if count > 0 {
                let label = if count == 1 { singular } else { plural };
                println!("  {count} {label}");
            }
        }
        if graph.resources().is_empty() {
            println!("  no resources declared");
        }
        Ok(())
    }
}

const KIND_LABELS: &[(ResourceKind, &str, &str)] = &[
    (ResourceKind::ApiEndpoint, "api endpoint", "api endpoints"),
    (ResourceKind::SqlDatabase, "sql database", "sql databases"),
    (ResourceKind::PubSubTopic, "pub/sub topic", "pub/sub topics"),
    (
        ResourceKind::PubSubSubscription,
        "pub/sub subscription",
        "pub/sub subscriptions",
    ),
    (ResourceKind::CronJob, "cron job", "cron jobs"),
    (ResourceKind::Gateway, "gateway", "gateways"),
    (ResourceKind::Bucket, "bucket", "buckets"),
    (ResourceKind::Secret, "secret", "secrets"),
];

/// Load the manifest, walk the app root, and run discovery.
///
/// Validation failures print the rendered report and exit 1; only a clean
/// run returns.
pub(crate) fn discover(app_root: &std::path::Path) -> Result<(String, ResourceGraph)> {
    let toml = QuarryToml::open(app_root.join("quarry.toml")).unwrap_or_exit();
    let app = &toml.manifest().app;

    let root = AppRoot::new(app_root);
    let packages =
        load_packages(&root, &app.name).wrap_err("failed to walk the application root")?;

    let config = DiscoveryConfig::new(root, app);
    match run_discovery(&config, &packages) {
        Ok(graph) => Ok((app.name.clone(), graph)),
        Err(DiscoveryError::Invalid {
            diagnostics,
            report,
        }) => {
            eprint!("{report}");
            eprintln!(
                "\ndiscovery failed with {} diagnostic{}",
                diagnostics.len(),
                if diagnostics.len() == 1 { "" } else { "s" },
            );
            std::process::exit(1);
        }
        Err(DiscoveryError::Fatal(fatal)) => {
            eprintln!("{:?}", miette::Report::new(fatal));
            std::process::exit(1);
        }
        Err(err @ DiscoveryError::Cancelled) => Err(err.into()),
    }
}
