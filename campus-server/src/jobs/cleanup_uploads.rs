use std::collections::HashSet;
use std::time::Duration;

use tokio::{sync::oneshot, task::JoinHandle, time};

use crate::repository::Repository;
use crate::storage::UploadStore;

const SWEEP_INTERVAL: u64 = 300;
const GRACE_PERIOD: u64 = 3600;

/// Periodically removes uploaded files no longer referenced by any live
/// student record. Files younger than the grace period are left alone so
/// registrations in flight are not swept out from under the handler.
pub struct CleanupUploads {
    repository: Repository,
    uploads: UploadStore,
    shutdown_tx: Option<oneshot::Sender<()>>,
    join_handle: Option<JoinHandle<()>>,
}

impl CleanupUploads {
    pub fn with_repository(repository: Repository, uploads: UploadStore) -> Self {
        Self {
            repository,
            uploads,
            shutdown_tx: None,
            join_handle: None,
        }
    }

    pub async fn spawn(&mut self) {
        let (shutdown_tx, mut shutdown_rx) = oneshot::channel();
        let mut sweep_interval = time::interval(Duration::from_secs(SWEEP_INTERVAL));
        let repository = self.repository.clone();
        let uploads = self.uploads.clone();

        self.shutdown_tx = Some(shutdown_tx);
        self.join_handle = Some(tokio::spawn(async move {
            loop {
                tokio::select! {
                    _ = sweep_interval.tick() => {
                        sweep_orphaned_uploads(&repository, &uploads).await
                    },
                    _msg = &mut shutdown_rx => {
                        break;
                    }
                }
            }
        }));
    }

    pub async fn stop(&mut self) {
        if let Some(handle) = self.join_handle.take() {
            if let Some(tx) = self.shutdown_tx.take() {
                if tx.send(()).is_err() {
                    tracing::error!("failed to send CleanupUploads job shutdown signal");
                }
            }
            if let Err(e) = handle.await {
                tracing::error!("failed to wait for CleanupUploads job to terminate: {}", e);
            }
        }

        tracing::debug!("finished CleanupUploads job");
    }
}

async fn sweep_orphaned_uploads(repository: &Repository, uploads: &UploadStore) {
    let referenced: HashSet<String> = match repository.student().referenced_files().await {
        Ok(files) => files.into_iter().collect(),
        Err(e) => {
            tracing::error!("failed to read referenced upload files: {:?}", e);
            return;
        }
    };

    match uploads
        .sweep(&referenced, Duration::from_secs(GRACE_PERIOD))
        .await
    {
        Ok(removed) if removed > 0 => {
            tracing::info!(removed = removed, "swept orphaned uploads");
        }
        Ok(_) => {}
        Err(e) => {
            tracing::error!("failed to sweep orphaned uploads: {:?}", e);
        }
    }
}
