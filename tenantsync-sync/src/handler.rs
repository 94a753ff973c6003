//! Per-type handlers.
//!
//! A [`Handler`] binds one [`AssetType`] to its four stage functions. Stage
//! functions read the run's desired and current [`TenantState`] through a
//! [`StageContext`] and return a partial state for the orchestrator to merge.
//!
//! Two implementations cover every type the engine manages:
//! [`CollectionHandler`] for lists of assets and [`SingletonHandler`] for
//! tenant-wide settings objects. Both are driven by a [`HandlerDescriptor`].

use std::collections::HashSet;

use async_trait::async_trait;
use futures::future::try_join_all;
use serde::Serialize;
use serde_json::Value;
use tenantsync_core::{Asset, AssetType, AssetValue, Identifier, Stage, SyncConfig, TenantState};
use tenantsync_remote::{PagedClient, Pagination, ResourceClient, ResourceSpec};
use tracing::{debug, info, warn};

use crate::changes::calculate_changes;
use crate::dry_run::{calculate_dry_run_changes, ChangeAction, DryRunChange, DryRunEntry};
use crate::error::SyncError;

/// Stage order used when a descriptor does not set one.
pub const DEFAULT_ORDER: u32 = 50;

// ---------------------------------------------------------------------------
// Stage plumbing
// ---------------------------------------------------------------------------

/// What a stage function sees.
pub struct StageContext<'a> {
    pub desired: &'a TenantState,
    pub current: &'a TenantState,
    pub client: &'a PagedClient,
    pub config: &'a SyncConfig,
}

/// Created / updated / deleted counts for one type.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ChangeCounts {
    pub created: usize,
    pub updated: usize,
    pub deleted: usize,
}

impl ChangeCounts {
    pub fn total(&self) -> usize {
        self.created + self.updated + self.deleted
    }
}

/// What a stage function returns.
#[derive(Debug, Default)]
pub struct StageOutput {
    /// Partial state to merge.
    pub state: TenantState,
    /// Set by `processChanges`.
    pub changes: Option<ChangeCounts>,
}

impl StageOutput {
    pub fn state(asset_type: AssetType, value: AssetValue) -> Self {
        Self { state: [(asset_type, value)].into_iter().collect(), changes: None }
    }
}

// ---------------------------------------------------------------------------
// Descriptor
// ---------------------------------------------------------------------------

/// Static description of how one asset type is reconciled.
#[derive(Debug, Clone)]
pub struct HandlerDescriptor {
    pub asset_type: AssetType,
    pub resource: ResourceSpec,
    pub pagination: Pagination,
    /// Match priority order.
    pub identifiers: Vec<Identifier>,
    pub object_fields: Vec<String>,
    /// Field whose value addresses an asset remotely (`<path>/<value>`).
    pub address_field: String,
    /// Dropped from update payloads; the API rejects them on PATCH.
    pub strip_on_update: Vec<String>,
    /// Dropped from create payloads; the API assigns them.
    pub strip_on_create: Vec<String>,
    pub orders: Vec<(Stage, u32)>,
}

impl HandlerDescriptor {
    pub fn new(asset_type: AssetType, path: &str, list_key: &str) -> Self {
        Self {
            asset_type,
            resource: ResourceSpec::new(path, list_key),
            pagination: Pagination::None,
            identifiers: vec![Identifier::field("id")],
            object_fields: Vec::new(),
            address_field: "id".to_owned(),
            strip_on_update: vec!["id".to_owned()],
            strip_on_create: vec!["id".to_owned()],
            orders: Vec::new(),
        }
    }

    #[must_use]
    pub fn with_pagination(mut self, pagination: Pagination) -> Self {
        self.pagination = pagination;
        self
    }

    #[must_use]
    pub fn with_identifiers(mut self, identifiers: Vec<Identifier>) -> Self {
        self.identifiers = identifiers;
        self
    }

    #[must_use]
    pub fn with_object_fields(mut self, fields: &[&str]) -> Self {
        self.object_fields = fields.iter().map(|f| (*f).to_owned()).collect();
        self
    }

    /// Sets the address field; it is always stripped from both payloads.
    #[must_use]
    pub fn with_address_field(mut self, field: &str) -> Self {
        self.address_field = field.to_owned();
        self.strip_on_update = vec![field.to_owned()];
        self.strip_on_create = vec![field.to_owned()];
        self
    }

    #[must_use]
    pub fn strip_on_update(mut self, fields: &[&str]) -> Self {
        self.strip_on_update.extend(fields.iter().map(|f| (*f).to_owned()));
        self
    }

    #[must_use]
    pub fn with_order(mut self, stage: Stage, order: u32) -> Self {
        self.orders.push((stage, order));
        self
    }

    pub fn order(&self, stage: Stage) -> u32 {
        self.orders
            .iter()
            .find(|(s, _)| *s == stage)
            .map_or(DEFAULT_ORDER, |(_, o)| *o)
    }

    fn update_payload(&self, asset: &Asset) -> Asset {
        strip(asset, &self.strip_on_update)
    }

    fn create_payload(&self, asset: &Asset) -> Asset {
        strip(asset, &self.strip_on_create)
    }
}

fn strip(asset: &Asset, fields: &[String]) -> Asset {
    asset
        .iter()
        .filter(|(k, _)| !fields.contains(k))
        .map(|(k, v)| (k.clone(), v.clone()))
        .collect()
}

// ---------------------------------------------------------------------------
// Trait
// ---------------------------------------------------------------------------

#[async_trait]
pub trait Handler: Send + Sync {
    fn descriptor(&self) -> &HandlerDescriptor;

    fn asset_type(&self) -> AssetType {
        self.descriptor().asset_type
    }

    fn order(&self, stage: Stage) -> u32 {
        self.descriptor().order(stage)
    }

    fn identifiers(&self) -> &[Identifier] {
        &self.descriptor().identifiers
    }

    fn object_fields(&self) -> &[String] {
        &self.descriptor().object_fields
    }

    /// Label for logs and reports.
    fn obj_string(&self, asset: &Asset) -> String {
        if let Some(name) = asset.get("name").and_then(Value::as_str) {
            return name.to_owned();
        }
        if let Some(address) = asset.get(&self.descriptor().address_field).and_then(Value::as_str) {
            return address.to_owned();
        }
        Value::Object(asset.clone()).to_string()
    }

    async fn load(&self, cx: &StageContext<'_>) -> Result<StageOutput, SyncError>;

    async fn validate(&self, cx: &StageContext<'_>) -> Result<StageOutput, SyncError>;

    async fn process_changes(&self, cx: &StageContext<'_>) -> Result<StageOutput, SyncError>;

    /// `None` when the desired state says nothing about this type.
    async fn dry_run(&self, cx: &StageContext<'_>) -> Result<Option<DryRunEntry>, SyncError>;
}

// ---------------------------------------------------------------------------
// Collections
// ---------------------------------------------------------------------------

/// Handler for list-shaped asset types.
pub struct CollectionHandler {
    descriptor: HandlerDescriptor,
}

impl CollectionHandler {
    pub fn new(descriptor: HandlerDescriptor) -> Self {
        Self { descriptor }
    }

    fn resource(&self, cx: &StageContext<'_>) -> ResourceClient {
        cx.client.resource(self.descriptor.resource.clone())
    }

    fn pagination(&self, config: &SyncConfig) -> Pagination {
        match &self.descriptor.pagination {
            Pagination::Offset { .. } => Pagination::Offset { per_page: config.page_size },
            other => other.clone(),
        }
    }

    async fn fetch(&self, cx: &StageContext<'_>) -> Result<Vec<Asset>, SyncError> {
        let items = self.resource(cx).list(&self.pagination(cx.config)).await?;
        Ok(items)
    }

    /// Current state from a previous `load`, or fetched now.
    async fn current(&self, cx: &StageContext<'_>) -> Result<Vec<Asset>, SyncError> {
        match cx.current.collection(self.asset_type()) {
            Some(items) => Ok(items.to_vec()),
            None => self.fetch(cx).await,
        }
    }

    fn address(&self, asset: &Asset) -> Result<String, SyncError> {
        let field = &self.descriptor.address_field;
        match asset.get(field) {
            Some(Value::String(s)) => Ok(s.clone()),
            Some(Value::Number(n)) => Ok(n.to_string()),
            _ => Err(SyncError::MissingIdentifier {
                asset_type: self.asset_type(),
                field: field.clone(),
                asset: self.obj_string(asset),
            }),
        }
    }

    /// Label used in dry-run reports: first identifier value present.
    fn report_identifier(&self, asset: &Asset) -> String {
        self.descriptor
            .identifiers
            .iter()
            .find_map(|id| id.key_of(asset))
            .unwrap_or_else(|| self.obj_string(asset))
    }
}

#[async_trait]
impl Handler for CollectionHandler {
    fn descriptor(&self) -> &HandlerDescriptor {
        &self.descriptor
    }

    async fn load(&self, cx: &StageContext<'_>) -> Result<StageOutput, SyncError> {
        let items = self.fetch(cx).await?;
        info!(asset_type = %self.asset_type(), count = items.len(), "loaded current state");
        Ok(StageOutput::state(self.asset_type(), AssetValue::Collection(items)))
    }

    async fn validate(&self, cx: &StageContext<'_>) -> Result<StageOutput, SyncError> {
        let Some(desired) = cx.desired.collection(self.asset_type()) else {
            return Ok(StageOutput::default());
        };
        for identifier in self.identifiers() {
            let mut seen = HashSet::new();
            for key in desired.iter().filter_map(|a| identifier.key_of(a)) {
                if !seen.insert(key.clone()) {
                    return Err(SyncError::Validation {
                        asset_type: self.asset_type(),
                        message: format!("more than one asset with {identifier} '{key}'"),
                    });
                }
            }
        }
        Ok(StageOutput::default())
    }

    async fn process_changes(&self, cx: &StageContext<'_>) -> Result<StageOutput, SyncError> {
        let ty = self.asset_type();
        let Some(desired) = cx.desired.collection(ty) else {
            debug!(asset_type = %ty, "not in desired state, skipping");
            return Ok(StageOutput::default());
        };
        let current = self.current(cx).await?;
        let changes = calculate_changes(
            ty,
            desired,
            &current,
            self.identifiers(),
            self.object_fields(),
            cx.config.allow_delete,
        );
        let resource = self.resource(cx);
        let mut result = current;
        let mut counts = ChangeCounts::default();

        // 1. Deletes
        if cx.config.allow_delete {
            let ids = changes
                .delete
                .iter()
                .map(|a| self.address(a))
                .collect::<Result<Vec<_>, _>>()?;
            try_join_all(ids.iter().map(|id| resource.delete(id))).await?;
            result.retain(|a| self.address(a).map_or(true, |id| !ids.contains(&id)));
            counts.deleted = ids.len();
        } else if !changes.delete.is_empty() {
            let names: Vec<String> = changes.delete.iter().map(|a| self.obj_string(a)).collect();
            warn!(
                asset_type = %ty,
                assets = %names.join(", "),
                "remote assets are absent from desired state; enable allow_delete to remove them"
            );
        }

        // 2. Conflicts are moved aside before anything claims their name.
        let renames = changes
            .conflicts
            .iter()
            .map(|a| {
                let id = self.address(a)?;
                let name = a.get("name").cloned().unwrap_or(Value::Null);
                info!(asset_type = %ty, id = %id, name = %name, "renaming conflicting asset");
                let body: Asset = [("name".to_owned(), name)].into_iter().collect();
                Ok((id, body))
            })
            .collect::<Result<Vec<_>, SyncError>>()?;
        let renamed = try_join_all(renames.iter().map(|(id, body)| resource.update(id, body))).await?;
        replace_by_address(&mut result, renamed, |a| self.address(a).ok());

        // 3. Creates
        let creates: Vec<Asset> = changes.create.iter().map(|a| self.descriptor.create_payload(a)).collect();
        let created = try_join_all(creates.iter().map(|body| resource.create(body))).await?;
        counts.created = created.len();
        result.extend(created);

        // 4. Updates
        let updates = changes
            .update
            .iter()
            .map(|a| Ok((self.address(a)?, self.descriptor.update_payload(a))))
            .collect::<Result<Vec<_>, SyncError>>()?;
        let updated = try_join_all(updates.iter().map(|(id, body)| resource.update(id, body))).await?;
        counts.updated = updated.len();
        replace_by_address(&mut result, updated, |a| self.address(a).ok());

        info!(
            asset_type = %ty,
            created = counts.created,
            updated = counts.updated,
            deleted = counts.deleted,
            "applied changes"
        );
        Ok(StageOutput {
            state: [(ty, AssetValue::Collection(result))].into_iter().collect(),
            changes: Some(counts),
        })
    }

    async fn dry_run(&self, cx: &StageContext<'_>) -> Result<Option<DryRunEntry>, SyncError> {
        let ty = self.asset_type();
        let Some(desired) = cx.desired.collection(ty) else {
            return Ok(None);
        };
        let current = self.current(cx).await?;
        let mut changes = calculate_dry_run_changes(ty, desired, &current, self.identifiers());
        if !cx.config.allow_delete {
            changes.delete.clear();
        }
        Ok(Some(DryRunEntry::from_changes(&changes, |a| self.report_identifier(a))))
    }
}

/// Swap each returned asset in for the entry with the same address.
fn replace_by_address(
    items: &mut Vec<Asset>,
    returned: Vec<Asset>,
    address: impl Fn(&Asset) -> Option<String>,
) {
    for asset in returned {
        let Some(id) = address(&asset) else { continue };
        match items.iter_mut().find(|a| address(a).as_deref() == Some(id.as_str())) {
            Some(slot) => *slot = asset,
            None => items.push(asset),
        }
    }
}

// ---------------------------------------------------------------------------
// Singletons
// ---------------------------------------------------------------------------

/// Handler for tenant-wide settings objects.
pub struct SingletonHandler {
    descriptor: HandlerDescriptor,
}

impl SingletonHandler {
    pub fn new(descriptor: HandlerDescriptor) -> Self {
        Self { descriptor }
    }

    fn resource(&self, cx: &StageContext<'_>) -> ResourceClient {
        cx.client.resource(self.descriptor.resource.clone())
    }
}

#[async_trait]
impl Handler for SingletonHandler {
    fn descriptor(&self) -> &HandlerDescriptor {
        &self.descriptor
    }

    async fn load(&self, cx: &StageContext<'_>) -> Result<StageOutput, SyncError> {
        let settings = self.resource(cx).get().await?;
        info!(asset_type = %self.asset_type(), "loaded current state");
        Ok(StageOutput::state(self.asset_type(), AssetValue::Singleton(settings)))
    }

    async fn validate(&self, _cx: &StageContext<'_>) -> Result<StageOutput, SyncError> {
        Ok(StageOutput::default())
    }

    async fn process_changes(&self, cx: &StageContext<'_>) -> Result<StageOutput, SyncError> {
        let ty = self.asset_type();
        let Some(desired) = cx.desired.singleton(ty) else {
            debug!(asset_type = %ty, "not in desired state, skipping");
            return Ok(StageOutput::default());
        };
        let body = self.descriptor.update_payload(desired);
        let updated = self.resource(cx).update_settings(&body).await?;
        info!(asset_type = %ty, "updated settings");
        Ok(StageOutput {
            state: [(ty, AssetValue::Singleton(updated))].into_iter().collect(),
            changes: Some(ChangeCounts { updated: 1, ..ChangeCounts::default() }),
        })
    }

    async fn dry_run(&self, cx: &StageContext<'_>) -> Result<Option<DryRunEntry>, SyncError> {
        let ty = self.asset_type();
        Ok(cx.desired.singleton(ty).map(|desired| DryRunEntry {
            updated: 1,
            changes: vec![DryRunChange {
                action: ChangeAction::Update,
                identifier: ty.to_string(),
                details: desired.clone(),
            }],
            ..DryRunEntry::default()
        }))
    }
}
