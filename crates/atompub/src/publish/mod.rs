//! # Publishing
//!
//! Publishing a module version takes three steps against the repository:
//!
//! 1. resolve the module's edit URL, creating the module if needed,
//! 2. upload its resources, collecting where each of them landed,
//! 3. pack the document and the resulting manifest into a container and `PUT` it
//!    to the edit URL.
//!
//! Resource failures are tolerated unless configured otherwise; any other failure
//! aborts the publish and is returned as is.
pub mod upload;

use std::io::Read;
use std::sync::Arc;

use serde::Serialize;
use url::Url;

use crate::atom::Entry;
use crate::cancel::CancelToken;
use crate::container::Container;
use crate::envelope::Envelope;
use crate::error::{Error, Result};
use crate::manifest::ResourceManifest;
use crate::repo::{Repository, Resource, LATEST};
use crate::transport::Transport;

pub use upload::{upload_all, ResourceFailure, UploadOutcome};

/// Settings for a [`Publisher`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PublishConfig {
    /// Base URL of the repository.
    pub url: Url,
    /// Repository identifier written into the manifest.
    pub repository_id: String,
    pub envelope: Envelope,
    /// Upper bound on uploads in flight at once.
    pub max_concurrent_uploads: usize,
    /// Fail the publish if any resource fails to upload.
    pub require_all_resources: bool,
}

impl From<&config::Config> for PublishConfig {
    fn from(config: &config::Config) -> Self {
        PublishConfig {
            url: config.repository.url.clone(),
            repository_id: config.repository.id.clone(),
            envelope: config.envelope.into(),
            max_concurrent_uploads: config.upload.concurrency,
            require_all_resources: config.upload.require_all,
        }
    }
}

/// The module a publish writes to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Target {
    /// Create a new module.
    New,
    /// Publish a new version of a module that already exists.
    Existing(String),
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Stats {
    pub uploaded: usize,
    pub failed: usize,
}

/// The result of a successful publish.
#[derive(Debug)]
pub struct PublishReport {
    /// Where the module version was published.
    pub edit_url: Url,
    /// The entry returned by the final update.
    pub entry: Entry,
    pub manifest: ResourceManifest,
    /// Resources left out of the manifest.
    pub failures: Vec<ResourceFailure>,
    pub stats: Stats,
}

/// A serializable digest of a [`PublishReport`].
#[derive(Debug, Serialize)]
pub struct Summary<'a> {
    pub module: &'a str,
    pub edit_url: &'a str,
    pub stats: Stats,
    pub resources: &'a [crate::manifest::ResourceRecord],
    pub failed: Vec<&'a str>,
}

impl PublishReport {
    pub fn summary(&self) -> Summary<'_> {
        Summary {
            module: &self.entry.id,
            edit_url: self.edit_url.as_str(),
            stats: self.stats,
            resources: self.manifest.records(),
            failed: self.failures.iter().map(|f| f.name.as_str()).collect(),
        }
    }
}

/// Publishes module versions to one repository.
#[derive(Debug)]
pub struct Publisher<T: ?Sized> {
    repo: Arc<Repository<T>>,
    config: PublishConfig,
}

impl<T: Transport + ?Sized + 'static> Publisher<T> {
    pub fn new(transport: Arc<T>, config: PublishConfig) -> Self {
        let repo = Repository::new(transport, config.url.clone(), config.repository_id.clone());
        Publisher {
            repo: Arc::new(repo),
            config,
        }
    }

    pub fn repository(&self) -> &Arc<Repository<T>> {
        &self.repo
    }

    pub fn config(&self) -> &PublishConfig {
        &self.config
    }

    /// Publish `document` and its `resources` as a new version of `target`.
    pub async fn publish<D>(
        &self,
        target: Target,
        document: D,
        resources: Vec<Resource>,
        cancel: &CancelToken,
    ) -> Result<PublishReport>
    where
        D: Read + Send + 'static,
    {
        cancel.check()?;
        let edit_url = self.resolve(target).await?;
        tracing::info!(%edit_url, resources = resources.len(), "publishing module");

        cancel.check()?;
        let UploadOutcome { manifest, failures } = upload_all(
            Arc::clone(&self.repo),
            resources,
            self.config.max_concurrent_uploads,
            cancel,
        )
        .await?;

        let stats = Stats {
            uploaded: manifest.len(),
            failed: failures.len(),
        };
        tracing::info!(stats.uploaded, stats.failed, "finished uploading resources");

        if self.config.require_all_resources && !failures.is_empty() {
            return Err(Error::ResourcesFailed {
                failed: failures.len(),
            });
        }

        cancel.check()?;
        let envelope = self.config.envelope;
        let reader = manifest.clone().into_reader();
        let content = blocking(move || {
            Container::build(document, reader, envelope)
                .and_then(Container::serialize)
                .map_err(|source| Error::Marshal {
                    what: "container",
                    source,
                })
        })
        .await?;

        cancel.check()?;
        let repo = Arc::clone(&self.repo);
        let url = edit_url.clone();
        let entry = blocking(move || repo.upload_version(&url, content)).await?;
        tracing::info!(module = %entry.id, "published module");

        Ok(PublishReport {
            edit_url,
            entry,
            manifest,
            failures,
            stats,
        })
    }

    async fn resolve(&self, target: Target) -> Result<Url> {
        let repo = Arc::clone(&self.repo);
        match target {
            Target::New => blocking(move || repo.create_module()).await,
            Target::Existing(module) => {
                tracing::debug!(%module, version = LATEST, "looking up module");
                blocking(move || repo.edit_url(&module)).await
            }
        }
    }
}

/// Run blocking repository work off the async runtime.
async fn blocking<F, R>(f: F) -> Result<R>
where
    F: FnOnce() -> Result<R> + Send + 'static,
    R: Send + 'static,
{
    tokio::task::spawn_blocking(f).await?
}
