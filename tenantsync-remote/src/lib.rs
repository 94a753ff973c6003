//! # tenantsync-remote
//!
//! Access to the remote tenant API.
//!
//! - [`api::ResourceApi`]: raw list/get/create/update/delete seam
//! - [`http::HttpResourceApi`]: `reqwest` implementation of that seam
//! - [`pool::RequestPool`]: concurrency and frequency limits, retries
//! - [`paginate::PagedClient`]: factory for pooled, paginated
//!   [`paginate::ResourceClient`]s

pub mod api;
pub mod error;
pub mod http;
pub mod paginate;
pub mod pool;

pub use api::{ListPage, ListQuery, ResourceApi};
pub use error::RemoteError;
pub use http::HttpResourceApi;
pub use paginate::{PagedClient, Pagination, ResourceClient, ResourceSpec};
pub use pool::RequestPool;
