use std::collections::BTreeMap;

use async_trait::async_trait;
use qbit_exporter_common::error::FetchError;

use crate::types::{CategoryInfo, StatusPayload, Torrent};

/// Read-only view of the upstream torrent client.
///
/// Each call is independent: a failure in one must not stop callers from
/// attempting the others.
#[async_trait]
pub trait UpstreamClient: Send + Sync {
    async fn fetch_status(&self) -> Result<StatusPayload, FetchError>;

    async fn fetch_categories(&self) -> Result<BTreeMap<String, CategoryInfo>, FetchError>;

    async fn fetch_items(&self) -> Result<Vec<Torrent>, FetchError>;
}

