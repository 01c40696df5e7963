use super::{connect, RepoArgs};

use atompub::repo::{ModuleContent, LATEST};
use atompub::{Envelope, Repository};
use clap::Parser;
use std::io::{self, Write};

#[derive(Parser, Debug)]
pub(in super::super) struct ShowArgs {
    /// The module to show
    #[arg(value_name = "ID")]
    module: String,

    /// The version to show
    #[arg(long, default_value = LATEST)]
    version: String,

    #[command(flatten)]
    repo: RepoArgs,
}

pub(super) async fn run(args: ShowArgs) -> anyhow::Result<()> {
    let settings = args.repo.settings();
    let envelope = Envelope::from(settings.envelope);
    let repo = Repository::new(connect().await?, settings.repository.url, settings.repository.id);

    let ShowArgs {
        module, version, ..
    } = args;
    // the repository, and with it the transport, is dropped on the blocking pool
    let content =
        tokio::task::spawn_blocking(move || repo.module_content(&module, &version, envelope))
            .await??;

    print(&mut io::stdout().lock(), &content)?;
    Ok(())
}

fn print(w: &mut impl Write, content: &ModuleContent) -> io::Result<()> {
    let ModuleContent {
        entry,
        document,
        manifest,
    } = content;

    writeln!(w, "id: {}", entry.id)?;
    for link in &entry.links {
        writeln!(w, "link: {} {}", link.rel, link.href)?;
    }
    writeln!(w, "\ndocument:\n{}", String::from_utf8_lossy(document))?;
    writeln!(w, "\nresources (manifest version {}):", manifest.version())?;
    for record in manifest.records() {
        writeln!(
            w,
            "  {} -> {}/{}",
            record.name, record.repository_id, record.resource_id
        )?;
    }
    Ok(())
}
