//! Persistence Writer Task
//!
//! Background task that writes local cache snapshots to disk.
//!
//! Mutations only flip a `watch` flag. The task wakes on the flag, encodes
//! the current state once and replaces the file, so a burst of mutations
//! collapses into a single serialization and a single write. Writes never
//! overlap because only this task performs them.

use std::future::Future;
use std::path::PathBuf;

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use crate::cache::local::write_bytes;
use crate::error::Result;

/// Sender side of the writer task, owned by the local backend.
#[derive(Debug)]
pub struct PersistHandle {
    tx: watch::Sender<()>,
    task: JoinHandle<()>,
}

impl PersistHandle {
    /// Schedules a write of the current state. Returns immediately.
    pub fn mark_dirty(&self) {
        self.tx.send_replace(());
    }

    /// Closes the channel and waits for the final write to finish.
    pub async fn shutdown(self) {
        let Self { tx, task } = self;
        drop(tx);
        if let Err(e) = task.await {
            warn!(error = %e, "Persistence task ended abnormally");
        }
    }
}

/// Spawns the writer for `path`.
///
/// `encode` is called once per batch of dirty notifications and returns the
/// bytes to write, or `None` once the state it reads from is gone. The task
/// exits when the handle is shut down, after flushing a pending batch.
pub fn spawn_persist_task<F, Fut>(path: PathBuf, encode: F) -> PersistHandle
where
    F: Fn() -> Fut + Send + 'static,
    Fut: Future<Output = Option<Result<Vec<u8>>>> + Send + 'static,
{
    let (tx, mut rx) = watch::channel(());

    let task = tokio::spawn(async move {
        debug!(path = %path.display(), "Starting cache persistence task");

        // `changed` still reports a notification sent right before the sender dropped.
        while rx.changed().await.is_ok() {
            let bytes = match encode().await {
                Some(Ok(bytes)) => bytes,
                Some(Err(e)) => {
                    warn!(error = %e, "Failed to encode cache snapshot");
                    continue;
                }
                None => break,
            };

            match write_bytes(&path, &bytes).await {
                Ok(()) => debug!(bytes = bytes.len(), "Cache snapshot written"),
                Err(e) => warn!(
                    path = %path.display(),
                    error = %e,
                    "Failed to persist cache snapshot, memory state remains authoritative"
                ),
            }
        }
    });

    PersistHandle { tx, task }
}
