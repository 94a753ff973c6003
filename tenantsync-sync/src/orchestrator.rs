//! Stage orchestrator.
//!
//! Owns the run's handlers and both halves of the run state. Each stage walks
//! the handlers in ascending per-stage order (ties keep registration order),
//! hands every handler a [`StageContext`] and merges what it returns:
//!
//! | Stage            | Merged into     |
//! |------------------|-----------------|
//! | `load`           | current state   |
//! | `validate`       | desired state   |
//! | `processChanges` | current state   |
//!
//! `dryRun` fans out across handlers instead and builds a [`DryRunReport`].
//!
//! Stages only run in lifecycle order (`load`, `validate`, then either
//! `processChanges` or `dryRun`); calling one early returns
//! [`SyncError::OutOfOrder`] and leaves the run untouched.
//!
//! The first handler error stops the stage, is annotated with its type and
//! stage, and leaves the orchestrator [`Phase::Failed`]; every later call
//! returns [`SyncError::Aborted`].

use std::collections::BTreeMap;
use std::fmt;

use chrono::{DateTime, Utc};
use futures::future::join_all;
use serde::Serialize;
use tenantsync_core::{schema, AssetType, Stage, SyncConfig, TenantState};
use tenantsync_remote::PagedClient;
use tracing::{debug, error, info};

use crate::catalog;
use crate::dry_run::DryRunReport;
use crate::error::SyncError;
use crate::handler::{ChangeCounts, Handler, StageContext, StageOutput};

/// Where a run is in its lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum Phase {
    Constructed,
    Loaded,
    Validated,
    Applied,
    DryRunReported,
    Failed,
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Phase::Constructed => "constructed",
            Phase::Loaded => "loaded",
            Phase::Validated => "validated",
            Phase::Applied => "applied",
            Phase::DryRunReported => "dry-run-reported",
            Phase::Failed => "failed",
        })
    }
}

/// Per-type change counts of an applied run.
pub type RunOutcome = BTreeMap<AssetType, ChangeCounts>;

/// Result of [`Orchestrator::deploy`].
#[derive(Debug, Clone, Serialize)]
pub struct RunSummary {
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub outcome: RunOutcome,
}

impl RunSummary {
    pub fn total(&self) -> ChangeCounts {
        self.outcome.values().fold(ChangeCounts::default(), |acc, c| ChangeCounts {
            created: acc.created + c.created,
            updated: acc.updated + c.updated,
            deleted: acc.deleted + c.deleted,
        })
    }
}

pub struct Orchestrator {
    client: PagedClient,
    config: SyncConfig,
    handlers: Vec<Box<dyn Handler>>,
    desired: TenantState,
    current: TenantState,
    outcome: RunOutcome,
    phase: Phase,
}

impl Orchestrator {
    /// Orchestrator over the full handler catalogue.
    pub fn new(client: PagedClient, desired: TenantState, config: SyncConfig) -> Result<Self, SyncError> {
        Self::with_handlers(client, desired, config, catalog::handlers())
    }

    /// Orchestrator over `handlers`, filtered by the config's include/exclude.
    pub fn with_handlers(
        client: PagedClient,
        desired: TenantState,
        config: SyncConfig,
        handlers: Vec<Box<dyn Handler>>,
    ) -> Result<Self, SyncError> {
        config.validate()?;
        let handlers: Vec<_> = handlers
            .into_iter()
            .filter(|h| config.is_enabled(h.asset_type()))
            .collect();
        debug!(
            handlers = %handlers.iter().map(|h| h.asset_type().as_str()).collect::<Vec<_>>().join(","),
            "orchestrator constructed"
        );
        Ok(Self {
            client,
            config,
            handlers,
            desired,
            current: TenantState::new(),
            outcome: RunOutcome::new(),
            phase: Phase::Constructed,
        })
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn desired(&self) -> &TenantState {
        &self.desired
    }

    pub fn current(&self) -> &TenantState {
        &self.current
    }

    pub fn outcome(&self) -> &RunOutcome {
        &self.outcome
    }

    /// Types with an active handler, in registration order.
    pub fn asset_types(&self) -> Vec<AssetType> {
        self.handlers.iter().map(|h| h.asset_type()).collect()
    }

    pub fn into_current(self) -> TenantState {
        self.current
    }

    /// Handler indices sorted by their order for `stage`.
    fn ordered(&self, stage: Stage) -> Vec<usize> {
        let mut indices: Vec<usize> = (0..self.handlers.len()).collect();
        indices.sort_by_key(|&i| self.handlers[i].order(stage));
        indices
    }

    /// `stage` may only start from `expected`.
    fn expect_phase(&self, stage: Stage, expected: Phase) -> Result<(), SyncError> {
        match self.phase {
            Phase::Failed => Err(SyncError::Aborted),
            actual if actual == expected => Ok(()),
            actual => Err(SyncError::OutOfOrder { stage, expected, actual }),
        }
    }

    fn fail(&mut self, err: SyncError) -> SyncError {
        self.phase = Phase::Failed;
        err
    }

    // -----------------------------------------------------------------------
    // Stages
    // -----------------------------------------------------------------------

    /// Run one stage across every handler. Callers check the phase first.
    async fn run_stage(&mut self, stage: Stage) -> Result<(), SyncError> {
        info!(stage = %stage, "running stage");

        for i in self.ordered(stage) {
            let handler = &self.handlers[i];
            let ty = handler.asset_type();
            let result = {
                let cx = StageContext {
                    desired: &self.desired,
                    current: &self.current,
                    client: &self.client,
                    config: &self.config,
                };
                match stage {
                    Stage::Load => handler.load(&cx).await,
                    Stage::Validate => handler.validate(&cx).await,
                    Stage::ProcessChanges => handler.process_changes(&cx).await,
                    Stage::DryRun => Ok(StageOutput::default()),
                }
            };
            let output = match result {
                Ok(output) => output,
                Err(e) => {
                    let err = e.in_stage(ty, stage);
                    error!(asset_type = %ty, stage = %stage, error = %err, "handler failed");
                    return Err(self.fail(err));
                }
            };

            if let Some(counts) = output.changes {
                self.outcome.insert(ty, counts);
            }
            match stage {
                Stage::Validate => self.desired.merge(output.state),
                _ => self.current.merge(output.state),
            }
        }
        Ok(())
    }

    /// Fetch current state for every handled type.
    pub async fn load(&mut self) -> Result<(), SyncError> {
        self.expect_phase(Stage::Load, Phase::Constructed)?;
        self.run_stage(Stage::Load).await?;
        self.phase = Phase::Loaded;
        Ok(())
    }

    /// Structural schema check, then each handler's own validation.
    pub async fn validate(&mut self) -> Result<(), SyncError> {
        self.expect_phase(Stage::Validate, Phase::Loaded)?;
        if let Err(e) = schema::validate_state(&self.desired) {
            return Err(self.fail(e.into()));
        }
        self.run_stage(Stage::Validate).await?;
        self.phase = Phase::Validated;
        Ok(())
    }

    /// Apply the desired state remotely.
    pub async fn process_changes(&mut self) -> Result<&RunOutcome, SyncError> {
        self.expect_phase(Stage::ProcessChanges, Phase::Validated)?;
        self.run_stage(Stage::ProcessChanges).await?;
        self.phase = Phase::Applied;
        Ok(&self.outcome)
    }

    /// Compute what [`process_changes`](Self::process_changes) would do.
    ///
    /// Handlers run concurrently. Every failure is logged; the first one in
    /// handler order is returned.
    pub async fn dry_run(&mut self) -> Result<DryRunReport, SyncError> {
        self.expect_phase(Stage::DryRun, Phase::Validated)?;
        info!(stage = %Stage::DryRun, "running stage");

        let order = self.ordered(Stage::DryRun);
        let results = {
            let cx = StageContext {
                desired: &self.desired,
                current: &self.current,
                client: &self.client,
                config: &self.config,
            };
            let cx = &cx;
            join_all(order.iter().map(|&i| {
                let handler = &self.handlers[i];
                async move { (handler.asset_type(), handler.dry_run(cx).await) }
            }))
            .await
        };

        let mut report = DryRunReport::new();
        let mut first_error = None;
        for (ty, result) in results {
            match result {
                Ok(Some(entry)) => {
                    report.insert(ty, entry);
                }
                Ok(None) => {}
                Err(e) => {
                    let err = e.in_stage(ty, Stage::DryRun);
                    error!(asset_type = %ty, stage = %Stage::DryRun, error = %err, "dry run failed");
                    first_error.get_or_insert(err);
                }
            }
        }

        if let Some(err) = first_error {
            return Err(self.fail(err));
        }
        self.phase = Phase::DryRunReported;
        Ok(report)
    }

    // -----------------------------------------------------------------------
    // Whole runs
    // -----------------------------------------------------------------------

    /// `load → validate → processChanges`.
    pub async fn deploy(&mut self) -> Result<RunSummary, SyncError> {
        let started_at = Utc::now();
        self.load().await?;
        self.validate().await?;
        let outcome = self.process_changes().await?.clone();
        let summary = RunSummary { started_at, finished_at: Utc::now(), outcome };
        let total = summary.total();
        info!(
            created = total.created,
            updated = total.updated,
            deleted = total.deleted,
            "deploy complete"
        );
        Ok(summary)
    }

    /// `load → validate → dryRun`.
    pub async fn preview(&mut self) -> Result<DryRunReport, SyncError> {
        self.load().await?;
        self.validate().await?;
        self.dry_run().await
    }
}
