mod publish;
mod show;

use super::Args;

use atompub::transport::Transport;
use clap::{Parser, Subcommand};
use config::{Alphabet, Config, Layers, CONFIG};
use std::sync::Arc;
use url::Url;

#[derive(Subcommand)]
pub(super) enum Commands {
    /// Publish a module version and its resources to the repository.
    ///
    /// Every resource is uploaded first, concurrently; the module version is
    /// then published with a manifest of where each resource landed.
    /// Resources that fail to upload are reported and left out of the
    /// manifest unless `--require-all` is given.
    ///
    /// Press Ctrl-C to cancel an in-flight publish.
    #[command(verbatim_doc_comment)]
    Publish(publish::PublishArgs),
    /// Show a published module version: its links, document and manifest.
    Show(show::ShowArgs),
}

#[derive(Parser, Debug)]
#[command(next_help_heading = "Repository Options")]
pub(super) struct RepoArgs {
    /// Base URL of the repository's AtomPub service
    #[arg(long, value_name = "URL")]
    url: Option<Url>,
    /// Repository identifier recorded in the resource manifest
    #[arg(long, value_name = "ID")]
    repo_id: Option<String>,
    /// Base64 alphabet of the module content
    #[arg(long, value_enum)]
    alphabet: Option<Alphabet>,
    /// Number of base64 layers around the module content
    #[arg(long, value_enum)]
    layers: Option<Layers>,
}

impl RepoArgs {
    /// Layer the flags over the loaded configuration.
    fn apply(&self, config: &mut Config) {
        if let Some(url) = &self.url {
            config.repository.url = url.clone();
        }
        if let Some(id) = &self.repo_id {
            config.repository.id = id.clone();
        }
        if let Some(alphabet) = self.alphabet {
            config.envelope.alphabet = alphabet;
        }
        if let Some(layers) = self.layers {
            config.envelope.layers = layers;
        }
    }

    fn settings(&self) -> Config {
        let mut config = (*CONFIG).clone();
        self.apply(&mut config);
        tracing::debug!(
            url = %config.repository.url,
            repository = %config.repository.id,
            "using repository"
        );
        config
    }
}

#[cfg(feature = "http")]
async fn connect() -> anyhow::Result<Arc<dyn Transport>> {
    // the blocking client owns a runtime and cannot be built on a runtime thread
    let transport = tokio::task::spawn_blocking(atompub::HttpTransport::new).await??;
    Ok(Arc::new(transport))
}

#[cfg(not(feature = "http"))]
async fn connect() -> anyhow::Result<Arc<dyn Transport>> {
    anyhow::bail!("built without an HTTP transport, enable the `http` feature")
}

/// Drop the last handle to a transport off the runtime threads.
async fn release<T: Send + 'static>(value: T) -> anyhow::Result<()> {
    tokio::task::spawn_blocking(move || drop(value)).await?;
    Ok(())
}

pub async fn run(args: Args) -> anyhow::Result<()> {
    match args.command {
        Commands::Publish(args) => publish::run(args).await,
        Commands::Show(args) => show::run(args).await,
    }
}
