//! Paginated resource clients.
//!
//! [`PagedClient`] is the single factory for [`ResourceClient`]s; every
//! client it builds shares one [`RequestPool`], so the concurrency and
//! frequency limits hold across all entity types of a run.
//!
//! # Pagination styles
//!
//! | Style        | First call                             | Rest                                |
//! |--------------|----------------------------------------|-------------------------------------|
//! | None         | single call                            |:                                   |
//! | Offset       | `page=0&per_page=N&include_totals=true` | remaining pages fanned out, in order |
//! | Checkpoint   | `take=N` (+ `from`)                    | follow `next` until absent          |

use std::sync::Arc;

use tenantsync_core::{Asset, AssetCollection, PoolSettings};
use tracing::debug;

use crate::api::{ListPage, ListQuery, ResourceApi};
use crate::error::RemoteError;
use crate::pool::RequestPool;

/// Upper bound the remote API accepts for `per_page`.
pub const MAX_PAGE_SIZE: u32 = 100;
pub const DEFAULT_PAGE_SIZE: u32 = 100;
pub const DEFAULT_CHECKPOINT_TAKE: u32 = 50;

/// How a resource's `list` call is paged.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Pagination {
    None,
    Offset { per_page: u32 },
    Checkpoint { take: u32, from: Option<String> },
}

impl Pagination {
    pub fn offset() -> Self {
        Pagination::Offset { per_page: DEFAULT_PAGE_SIZE }
    }

    pub fn checkpoint() -> Self {
        Pagination::Checkpoint { take: DEFAULT_CHECKPOINT_TAKE, from: None }
    }
}

/// Where a resource lives on the remote API.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResourceSpec {
    /// Collection path, e.g. `client-grants`.
    pub path: String,
    /// Key holding the items in a wrapped list response.
    pub list_key: String,
}

impl ResourceSpec {
    pub fn new(path: impl Into<String>, list_key: impl Into<String>) -> Self {
        Self { path: path.into(), list_key: list_key.into() }
    }
}

/// Builds resource clients over one API and one pool.
#[derive(Clone)]
pub struct PagedClient {
    api: Arc<dyn ResourceApi>,
    pool: RequestPool,
}

impl PagedClient {
    pub fn new(api: Arc<dyn ResourceApi>, settings: &PoolSettings) -> Self {
        Self { api, pool: RequestPool::new(settings) }
    }

    pub fn resource(&self, spec: ResourceSpec) -> ResourceClient {
        ResourceClient { api: self.api.clone(), pool: self.pool.clone(), spec }
    }
}

/// Pooled, paginated access to one resource.
#[derive(Clone)]
pub struct ResourceClient {
    api: Arc<dyn ResourceApi>,
    pool: RequestPool,
    spec: ResourceSpec,
}

impl ResourceClient {
    /// Every item of the resource, in remote order.
    pub async fn list(&self, pagination: &Pagination) -> Result<AssetCollection, RemoteError> {
        match pagination {
            Pagination::None => Ok(self.fetch_page(ListQuery::default()).await?.items),
            Pagination::Offset { per_page } => self.list_offset(*per_page).await,
            Pagination::Checkpoint { take, from } => self.list_checkpoint(*take, from.clone()).await,
        }
    }

    /// The resource itself, for singletons such as `tenants/settings`.
    pub async fn get(&self) -> Result<Asset, RemoteError> {
        let path = self.spec.path.as_str();
        self.pool.run(path, || self.api.get(path)).await
    }

    pub async fn create(&self, body: &Asset) -> Result<Asset, RemoteError> {
        let path = self.spec.path.as_str();
        self.pool.run(path, || self.api.create(path, body)).await
    }

    /// PATCH `<path>/<id>`.
    pub async fn update(&self, id: &str, body: &Asset) -> Result<Asset, RemoteError> {
        let path = self.item_path(id);
        self.pool.run(&path, || self.api.update(&path, body)).await
    }

    /// PATCH the resource path itself (singletons).
    pub async fn update_settings(&self, body: &Asset) -> Result<Asset, RemoteError> {
        let path = self.spec.path.as_str();
        self.pool.run(path, || self.api.update(path, body)).await
    }

    pub async fn delete(&self, id: &str) -> Result<(), RemoteError> {
        let path = self.item_path(id);
        self.pool.run(&path, || self.api.delete(&path)).await
    }

    fn item_path(&self, id: &str) -> String {
        format!("{}/{}", self.spec.path, id)
    }

    async fn fetch_page(&self, query: ListQuery) -> Result<ListPage, RemoteError> {
        let spec = &self.spec;
        self.pool
            .run(&spec.path, || self.api.list(&spec.path, &spec.list_key, &query))
            .await
    }

    async fn list_offset(&self, per_page: u32) -> Result<AssetCollection, RemoteError> {
        let per_page = per_page.clamp(1, MAX_PAGE_SIZE);
        let first = self.fetch_page(ListQuery::offset(0, per_page)).await?;
        // A page without a total cannot prove the listing is complete.
        let total = match first.total {
            Some(total) => total,
            None if first.items.is_empty() => 0,
            None => {
                return Err(RemoteError::Integrity {
                    resource: self.spec.path.clone(),
                    message: "offset page carried no total".into(),
                })
            }
        };
        let pages = total.div_ceil(u64::from(per_page)).max(1);
        debug!(resource = %self.spec.path, total, pages, "offset pagination");

        let rest = (1..pages).map(|page| {
            let page = u32::try_from(page).unwrap_or(u32::MAX);
            self.fetch_page(ListQuery::offset(page, per_page))
        });
        // try_join_all yields results in input order, i.e. by page index.
        let rest = futures::future::try_join_all(rest).await?;

        let mut items = first.items;
        for page in rest {
            items.extend(page.items);
        }

        if items.len() as u64 != total {
            return Err(RemoteError::Integrity {
                resource: self.spec.path.clone(),
                message: format!("expected {total} items, received {}", items.len()),
            });
        }
        Ok(items)
    }

    async fn list_checkpoint(
        &self,
        take: u32,
        mut from: Option<String>,
    ) -> Result<AssetCollection, RemoteError> {
        let take = take.clamp(1, MAX_PAGE_SIZE);
        let mut items = Vec::new();
        loop {
            let page = self.fetch_page(ListQuery::checkpoint(from.clone(), take)).await?;
            items.extend(page.items);
            match page.next {
                Some(next) if from.as_deref() == Some(next.as_str()) => {
                    return Err(RemoteError::Integrity {
                        resource: self.spec.path.clone(),
                        message: format!("checkpoint cursor '{next}' did not advance"),
                    });
                }
                Some(next) => from = Some(next),
                None => break,
            }
        }
        debug!(resource = %self.spec.path, count = items.len(), "checkpoint pagination");
        Ok(items)
    }
}
