use super::{connect, release, RepoArgs};
use crate::cli::logging::LogValue;

use anyhow::Context;
use atompub::{cancel_pair, PublishConfig, PublishReport, Publisher, Resource, Target};
use clap::Parser;
use std::fs::{self, File};
use std::io;
use std::path::{Path, PathBuf};

/// The primary document of a module directory.
const DOCUMENT_NAME: &str = "index_auto_generated.cnxml";

#[derive(Parser, Debug)]
#[command(arg_required_else_help = true)]
pub(in super::super) struct PublishArgs {
    /// Publish a new version of an existing module instead of creating one
    #[arg(long, short, value_name = "ID")]
    module: Option<String>,

    /// Publish a module directory
    ///
    /// The directory's `index_auto_generated.cnxml` is the document, every
    /// other regular, non-hidden file in it is a resource.
    #[arg(long, short, value_name = "DIR", conflicts_with_all = ["document", "resources"])]
    dir: Option<PathBuf>,

    /// The CNXML document to publish
    #[arg(required_unless_present = "dir")]
    document: Option<PathBuf>,

    /// Resource files referenced by the document
    resources: Vec<PathBuf>,

    /// Refuse to publish the module if any resource fails to upload
    #[arg(long)]
    require_all: bool,

    /// Maximum number of resources uploaded at once
    #[arg(long, short = 'j', value_name = "N")]
    concurrency: Option<usize>,

    #[command(flatten)]
    repo: RepoArgs,
}

pub(super) async fn run(args: PublishArgs) -> anyhow::Result<()> {
    let mut settings = args.repo.settings();
    settings.upload.require_all |= args.require_all;
    if let Some(n) = args.concurrency {
        settings.upload.concurrency = n;
    }

    let (document, resources) = match args.dir {
        Some(dir) => scan_dir(&dir).with_context(|| format!("failed to read {}", dir.display()))?,
        None => (
            args.document.context("no document to publish")?,
            args.resources,
        ),
    };

    let file = File::open(&document)
        .with_context(|| format!("failed to open {}", document.display()))?;
    let resources = find_resources(&resources);

    let target = args.module.map_or(Target::New, Target::Existing);
    let publisher = Publisher::new(connect().await?, PublishConfig::from(&settings));

    let (handle, token) = cancel_pair();
    let interrupt = tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::warn!("interrupted, cancelling publish");
            handle.cancel();
        }
    });

    let result = publisher.publish(target, file, resources, &token).await;
    interrupt.abort();
    release(publisher).await?;

    let report = result?;
    summarize(&report);
    println!("{}", report.edit_url);
    Ok(())
}

fn summarize(report: &PublishReport) {
    for failure in &report.failures {
        failure.error.warn();
    }
    tracing::info!(
        module = %report.entry.id,
        report.stats.uploaded,
        report.stats.failed,
        "Finished publishing module"
    );
    tracing::debug!(summary = %report.summary().as_json());
}

/// Turn every existing resource file into a [`Resource`], skipping the rest.
///
/// Files are only opened once their upload starts.
fn find_resources(paths: &[PathBuf]) -> Vec<Resource> {
    paths
        .iter()
        .filter_map(|path| {
            if !path.is_file() {
                tracing::warn!(resource = %path.display(), "skipping resource, not a readable file");
                return None;
            }
            Resource::file(path)
                .with_context(|| format!("skipping resource {}", path.display()))
                .map_err(|e| {
                    tracing::warn!(message = %format!("{e:#}"));
                    e
                })
                .ok()
        })
        .collect()
}

/// Split a module directory into its document and its resources.
fn scan_dir(dir: &Path) -> io::Result<(PathBuf, Vec<PathBuf>)> {
    let mut resources = Vec::new();
    for entry in fs::read_dir(dir)? {
        let entry = entry.log_err()?;
        let name = entry.file_name();
        if name == DOCUMENT_NAME || name.to_string_lossy().starts_with('.') {
            continue;
        }
        if entry.file_type()?.is_file() {
            resources.push(entry.path());
        }
    }
    resources.sort();
    Ok((dir.join(DOCUMENT_NAME), resources))
}
