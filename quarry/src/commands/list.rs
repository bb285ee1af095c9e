use std::path::PathBuf;

use clap::Args;
use eyre::Result;
use quarry_graph::{CronSchedule, Resource, ResourceData, ResourceKind};

use super::check::discover;

#[derive(Args)]
pub struct ListCommand {
    /// Application root directory (defaults to the current directory)
    #[arg(long, default_value = ".")]
    pub app_root: PathBuf,
}

const KIND_ORDER: &[ResourceKind] = &[
    ResourceKind::ApiEndpoint,
    ResourceKind::SqlDatabase,
    ResourceKind::PubSubTopic,
    ResourceKind::PubSubSubscription,
    ResourceKind::CronJob,
    ResourceKind::Gateway,
    ResourceKind::Bucket,
    ResourceKind::Secret,
];

impl ListCommand {
    pub fn run(&self) -> Result<()> {
        let (_, graph) = discover(&self.app_root)?;

        if graph.resources().is_empty() {
            println!("No resources declared");
            return Ok(());
        }

        let mut first = true;
        for &kind in KIND_ORDER {
            let resources: Vec<_> = graph.of_kind(kind).collect();
            if resources.is_empty() {
                continue;
            }
            if !first {
                println!();
            }
            first = false;
            println!("{}:", kind);
            for res in resources {
                println!("  {}{}", res.id, detail(res));
            }
        }
        Ok(())
    }
}

fn detail(res: &Resource) -> String {
    match &res.data {
        ResourceData::ApiEndpoint(api) => {
            format!("  {} {}", api.methods.join(","), api.path)
        }
        ResourceData::SqlDatabase(db) => {
            let n = db.migrations.len();
            format!("  ({n} migration{})", if n == 1 { "" } else { "s" })
        }
        ResourceData::CronJob(job) => match &job.schedule {
            CronSchedule::Every(minutes) => format!("  every {minutes}m -> {}", job.endpoint),
            CronSchedule::Cron(expr) => format!("  '{expr}' -> {}", job.endpoint),
        },
        ResourceData::PubSubTopic(topic) => format!("  carries {}", topic.message_type),
        ResourceData::PubSubSubscription(sub) => {
            format!("  on {} -> {}", sub.topic, sub.handler)
        }
        ResourceData::Gateway(_) | ResourceData::Bucket(_) | ResourceData::Secret(_) => {
            String::new()
        }
    }
}
