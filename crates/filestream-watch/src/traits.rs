//! Core traits for the file discovery system.

use crate::{error::Result, events::Snapshot};
use async_trait::async_trait;
use std::sync::Arc;

/// Produces a complete snapshot of the files currently visible.
///
/// Implementations hold no mutable state between calls, so the watcher can
/// invoke `scan` once per tick and test doubles can return fixed snapshots.
#[async_trait]
pub trait Scanner: Send + Sync {
    /// Scan the configured roots once.
    async fn scan(&self) -> Result<Snapshot>;
}

#[async_trait]
impl<S: Scanner + ?Sized> Scanner for Arc<S> {
    async fn scan(&self) -> Result<Snapshot> {
        (**self).scan().await
    }
}

#[async_trait]
impl<S: Scanner + ?Sized> Scanner for Box<S> {
    async fn scan(&self) -> Result<Snapshot> {
        (**self).scan().await
    }
}
