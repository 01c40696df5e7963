//! Concurrent resource uploads.
//!
//! Every resource is uploaded by its own task, at most `limit` of them touching the
//! network at once. Successful uploads are forwarded to a single collector that
//! owns the manifest; failures are reported back and never abort the others.
use std::sync::Arc;

use tokio::sync::{mpsc, Semaphore};
use tokio::task::JoinSet;

use crate::cancel::CancelToken;
use crate::error::{Error, Result};
use crate::manifest::ResourceManifest;
use crate::repo::{Repository, Resource};
use crate::transport::Transport;

/// A resource that could not be uploaded.
#[derive(Debug)]
pub struct ResourceFailure {
    pub name: String,
    pub error: Error,
}

/// The manifest of every resource that made it, and the ones that did not.
#[derive(Debug, Default)]
pub struct UploadOutcome {
    pub manifest: ResourceManifest,
    pub failures: Vec<ResourceFailure>,
}

/// Upload all `resources` to `repo`, returning once each of them has either
/// succeeded or failed.
///
/// Only cancellation and a panicking upload task fail the whole batch.
pub async fn upload_all<T>(
    repo: Arc<Repository<T>>,
    resources: Vec<Resource>,
    limit: usize,
    cancel: &CancelToken,
) -> Result<UploadOutcome>
where
    T: Transport + ?Sized + 'static,
{
    let (tx, mut rx) = mpsc::unbounded_channel();
    let collector = tokio::spawn(async move {
        let mut manifest = ResourceManifest::new();
        while let Some(record) = rx.recv().await {
            manifest.push(record);
        }
        manifest
    });

    let permits = Arc::new(Semaphore::new(limit.max(1)));
    let mut tasks = JoinSet::new();
    for resource in resources {
        let repo = Arc::clone(&repo);
        let permits = Arc::clone(&permits);
        let cancel = cancel.clone();
        let tx = tx.clone();
        tasks.spawn(async move {
            let name = resource.name().to_owned();
            let upload = async {
                let _permit = permits.acquire_owned().await.map_err(|_| Error::Cancelled)?;
                tokio::task::spawn_blocking(move || repo.upload_resource(resource, &cancel)).await?
            };
            match upload.await {
                Ok(record) => {
                    tracing::info!(resource = %name, resource.id = %record.resource_id, "uploaded resource");
                    // the collector outlives every sender
                    let _ = tx.send(record);
                    Ok(())
                }
                Err(error) => Err(ResourceFailure { name, error }),
            }
        });
    }
    drop(tx);

    let mut failures = Vec::new();
    loop {
        let task = tokio::select! {
            biased;
            _ = cancel.cancelled() => {
                tasks.shutdown().await;
                collector.abort();
                return Err(Error::Cancelled);
            }
            task = tasks.join_next() => task,
        };

        match task {
            None => break,
            Some(Ok(Ok(()))) => (),
            Some(Ok(Err(failure))) => {
                tracing::warn!(
                    resource = %failure.name,
                    error = %failure.error,
                    "failed to upload resource"
                );
                failures.push(failure);
            }
            Some(Err(e)) => return Err(Error::JoinFailed(e)),
        }
    }

    let manifest = collector.await?;
    Ok(UploadOutcome { manifest, failures })
}
