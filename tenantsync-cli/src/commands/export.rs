//! `tenantsync export`: write the tenant's current state to a document.

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Args;
use colored::Colorize;

use tenantsync_core::TenantState;
use tenantsync_sync::{export_document, read_local, write_document, Orchestrator};

use super::{build_client, load_config, runtime};

/// Arguments for `tenantsync export`.
#[derive(Args, Debug)]
pub struct ExportArgs {
    /// Document to write; keyword placeholders already in it are kept.
    pub file: PathBuf,

    /// Config file to use instead of `~/.tenantsync/config.yaml`.
    #[arg(long)]
    pub config: Option<PathBuf>,
}

impl ExportArgs {
    pub fn run(self) -> Result<()> {
        let config = load_config(self.config.as_deref())?;
        let client = build_client(&config)?;
        let mut orchestrator = Orchestrator::new(client, TenantState::new(), config.clone())?;

        runtime()?
            .block_on(orchestrator.load())
            .context("failed to load tenant state")?;
        let current = orchestrator.into_current();

        let local = if config.preserve_keywords {
            read_local(&self.file)?
        } else {
            None
        };
        let export = export_document(&current, local.as_ref(), &config);
        write_document(&self.file, &export.document)
            .with_context(|| format!("failed to write {}", self.file.display()))?;

        println!(
            "{} exported {} types to {}",
            "✓".green(),
            current.types().count(),
            self.file.display()
        );
        if export.restored > 0 {
            println!("  {} keyword placeholders preserved", export.restored);
        }
        for field in &export.drifted {
            println!("  {} {field} drifted from its template", "!".yellow());
        }
        Ok(())
    }
}
