//! Storage Backend Dispatch
//!
//! The two interchangeable backends behind one contract, selected once when
//! the store is built.

use tracing::info;

use crate::cache::entry::NewEntry;
use crate::cache::local::LocalBackend;
use crate::cache::shared::SharedBackend;
use crate::cache::{CacheEntry, PopularQuery};
use crate::config::StorageConfig;
use crate::error::Result;

/// What a write did to the store.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct WriteOutcome {
    /// Usage count after the write, `None` if the write was skipped
    pub usage_count: Option<u64>,
    /// Hashes removed by eviction
    pub evicted: Vec<String>,
    /// Entry count after the write, `None` when the backend does not track it
    pub size: Option<usize>,
}

#[derive(Debug)]
pub enum Backend {
    Local(LocalBackend),
    Shared(SharedBackend),
}

impl Backend {
    /// Builds the configured backend. Errors here are fatal at startup.
    pub async fn from_config(config: &StorageConfig) -> Result<Self> {
        let backend = match config {
            StorageConfig::Local { max_capacity, path } => {
                Self::Local(LocalBackend::open(path.clone(), *max_capacity).await?)
            }
            StorageConfig::Shared {
                base_url,
                table,
                api_key,
                timeout,
            } => Self::Shared(SharedBackend::open(base_url, table, api_key.clone(), *timeout)?),
        };
        info!(backend = backend.name(), "Cache backend ready");
        Ok(backend)
    }

    pub fn name(&self) -> &'static str {
        match self {
            Self::Local(_) => "local",
            Self::Shared(_) => "shared",
        }
    }

    pub async fn get(&self, hash: &str) -> Option<CacheEntry> {
        match self {
            Self::Local(b) => b.get(hash).await,
            Self::Shared(b) => b.get(hash).await,
        }
    }

    pub async fn put(&self, new: NewEntry) -> WriteOutcome {
        match self {
            Self::Local(b) => {
                let outcome = b.put(new).await;
                WriteOutcome {
                    usage_count: Some(outcome.usage_count),
                    evicted: outcome.evicted,
                    size: Some(outcome.size),
                }
            }
            Self::Shared(b) => WriteOutcome {
                usage_count: b.put(new).await,
                evicted: Vec::new(),
                size: None,
            },
        }
    }

    pub async fn clear(&self) {
        match self {
            Self::Local(b) => b.clear().await,
            Self::Shared(b) => b.clear().await,
        }
    }

    pub async fn popular(&self, limit: usize) -> Vec<PopularQuery> {
        match self {
            Self::Local(b) => b.popular(limit).await,
            Self::Shared(b) => b.popular(limit).await,
        }
    }

    /// Entry count; the shared backend reports 0.
    pub async fn len(&self) -> usize {
        match self {
            Self::Local(b) => b.len().await,
            Self::Shared(_) => 0,
        }
    }

    pub async fn close(&self) {
        if let Self::Local(b) = self {
            b.close().await;
        }
    }
}
