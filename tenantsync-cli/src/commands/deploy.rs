//! `tenantsync deploy`: apply or preview a desired-state document.

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Args;
use colored::Colorize;
use tabled::{settings::Style, Table, Tabled};

use tenantsync_sync::{load_desired, Orchestrator, RunSummary};

use super::{build_client, load_config, runtime};

/// Arguments for `tenantsync deploy`.
#[derive(Args, Debug)]
pub struct DeployArgs {
    /// Desired-state document (YAML or JSON).
    pub file: PathBuf,

    /// Report what would change as JSON without touching the tenant.
    #[arg(long)]
    pub dry_run: bool,

    /// Print the run summary as JSON instead of a table.
    #[arg(long)]
    pub json: bool,

    /// Config file to use instead of `~/.tenantsync/config.yaml`.
    #[arg(long)]
    pub config: Option<PathBuf>,
}

impl DeployArgs {
    pub fn run(self) -> Result<()> {
        let config = load_config(self.config.as_deref())?;
        let desired = load_desired(&self.file, &config.keyword_mappings)
            .with_context(|| format!("failed to read {}", self.file.display()))?;
        let client = build_client(&config)?;
        let mut orchestrator = Orchestrator::new(client, desired, config)?;

        runtime()?.block_on(async {
            if self.dry_run {
                let report = orchestrator.preview().await.context("dry run failed")?;
                println!("{}", serde_json::to_string_pretty(&report)?);
                return Ok::<(), anyhow::Error>(());
            }
            let summary = orchestrator.deploy().await.context("deploy failed")?;
            if self.json {
                println!("{}", serde_json::to_string_pretty(&summary)?);
            } else {
                print_summary(&summary);
            }
            Ok(())
        })
    }
}

#[derive(Tabled)]
struct SummaryRow {
    #[tabled(rename = "TYPE")]
    asset_type: String,
    #[tabled(rename = "CREATED")]
    created: usize,
    #[tabled(rename = "UPDATED")]
    updated: usize,
    #[tabled(rename = "DELETED")]
    deleted: usize,
}

fn print_summary(summary: &RunSummary) {
    if summary.outcome.is_empty() {
        println!("{} nothing to deploy", "✓".green());
        return;
    }

    let rows: Vec<SummaryRow> = summary
        .outcome
        .iter()
        .map(|(ty, counts)| SummaryRow {
            asset_type: ty.to_string(),
            created: counts.created,
            updated: counts.updated,
            deleted: counts.deleted,
        })
        .collect();
    let mut table = Table::new(rows);
    table.with(Style::rounded());
    println!("{table}");

    let total = summary.total();
    let elapsed = summary.finished_at - summary.started_at;
    println!(
        "{} deployed ({} created, {} updated, {} deleted) in {:.1}s",
        "✓".green(),
        total.created,
        total.updated,
        total.deleted,
        elapsed.num_milliseconds() as f64 / 1000.0
    );
}
