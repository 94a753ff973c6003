//! # tenantsync-sync
//!
//! Reconciliation engine: change calculation, per-type handlers and the stage
//! orchestrator that drives them.
//!
//! Build an [`Orchestrator`] from a [`PagedClient`](tenantsync_remote::PagedClient),
//! a desired [`TenantState`](tenantsync_core::TenantState) and a
//! [`SyncConfig`](tenantsync_core::SyncConfig), then call
//! [`Orchestrator::deploy`] or [`Orchestrator::preview`].

pub mod catalog;
pub mod changes;
pub mod document;
pub mod dry_run;
pub mod error;
pub mod handler;
pub mod orchestrator;

pub use changes::{calculate_changes, process_changed_object_fields, CalculatedChanges};
pub use document::{export_document, load_desired, parse_desired, read_local, write_document, Export};
pub use dry_run::{calculate_dry_run_changes, ChangeAction, DryRunChange, DryRunEntry, DryRunReport};
pub use error::SyncError;
pub use handler::{
    ChangeCounts, CollectionHandler, Handler, HandlerDescriptor, SingletonHandler, StageContext,
    StageOutput,
};
pub use orchestrator::{Orchestrator, Phase, RunOutcome, RunSummary};
