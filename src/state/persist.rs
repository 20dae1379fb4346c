// src/state/persist.rs
//! Debounced persistence for the state stores
//!
//! Mutations mark the store dirty; the actual write happens once a quiet
//! period elapses with no further mutations, so bursts of updates collapse
//! into a single disk write. Writes go to a temp file first and are
//! renamed into place, so readers never observe a partial file.

use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{mpsc, oneshot};
use tracing::{debug, warn};

use crate::error::{Error, Result};
use crate::metrics::ServiceMetrics;

enum Command {
    Dirty,
    Flush(oneshot::Sender<()>),
}

/// Coalesces dirty notifications into delayed snapshot writes
pub struct DebouncedWriter {
    tx: mpsc::UnboundedSender<Command>,
}

impl DebouncedWriter {
    /// Spawn the writer task for one backing file
    ///
    /// `snapshot` is evaluated when a write actually fires, not when the
    /// store was marked dirty, so the freshest state always lands on disk.
    pub fn spawn<F>(
        label: &'static str,
        path: PathBuf,
        quiet_period: Duration,
        metrics: Arc<ServiceMetrics>,
        snapshot: F,
    ) -> Self
    where
        F: Fn() -> Result<Vec<u8>> + Send + Sync + 'static,
    {
        let (tx, mut rx) = mpsc::unbounded_channel();

        tokio::spawn(async move {
            loop {
                let Some(command) = rx.recv().await else {
                    break;
                };
                match command {
                    Command::Flush(ack) => {
                        persist_snapshot(label, &path, &snapshot, &metrics, "flush").await;
                        let _ = ack.send(());
                        continue;
                    }
                    Command::Dirty => {}
                }

                // Dirty: hold off until the channel stays quiet
                loop {
                    match tokio::time::timeout(quiet_period, rx.recv()).await {
                        Ok(Some(Command::Dirty)) => continue,
                        Ok(Some(Command::Flush(ack))) => {
                            persist_snapshot(label, &path, &snapshot, &metrics, "flush").await;
                            let _ = ack.send(());
                            break;
                        }
                        Ok(None) => {
                            // Store dropped with changes pending
                            persist_snapshot(label, &path, &snapshot, &metrics, "shutdown")
                                .await;
                            return;
                        }
                        Err(_) => {
                            persist_snapshot(label, &path, &snapshot, &metrics, "quiet period elapsed")
                                .await;
                            break;
                        }
                    }
                }
            }
        });

        Self { tx }
    }

    /// Mark the backing store dirty; the write fires after the quiet period
    pub fn notify_dirty(&self) {
        let _ = self.tx.send(Command::Dirty);
    }

    /// Write the current snapshot immediately and wait for it to land
    pub async fn flush(&self) {
        let (ack_tx, ack_rx) = oneshot::channel();
        if self.tx.send(Command::Flush(ack_tx)).is_err() {
            return;
        }
        let _ = ack_rx.await;
    }
}

async fn persist_snapshot<F>(
    label: &str,
    path: &Path,
    snapshot: &F,
    metrics: &ServiceMetrics,
    reason: &str,
) where
    F: Fn() -> Result<Vec<u8>>,
{
    let bytes = match snapshot() {
        Ok(bytes) => bytes,
        Err(e) => {
            warn!("Failed to snapshot {} state for persistence: {}", label, e);
            metrics.record_persist_error();
            return;
        }
    };

    match write_atomic(path, &bytes).await {
        Ok(()) => {
            debug!("Persisted {} state to {} ({}, {} bytes)", label, path.display(), reason, bytes.len());
            metrics.record_persist_write();
        }
        Err(e) => {
            warn!("Failed to persist {} state: {}", label, e);
            metrics.record_persist_error();
        }
    }
}

/// Write to `<path>.tmp` and rename over the target
async fn write_atomic(path: &Path, bytes: &[u8]) -> Result<()> {
    let mut tmp = OsString::from(path.as_os_str());
    tmp.push(".tmp");
    let tmp = PathBuf::from(tmp);

    tokio::fs::write(&tmp, bytes).await.map_err(|e| Error::Persist {
        path: tmp.display().to_string(),
        reason: e.to_string(),
    })?;
    tokio::fs::rename(&tmp, path).await.map_err(|e| Error::Persist {
        path: path.display().to_string(),
        reason: e.to_string(),
    })?;
    Ok(())
}
