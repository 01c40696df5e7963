//! # Repository
//!
//! The URL layout of a module repository and the operations composed out of
//! plain Atom calls against it:
//!
//! | path                       | purpose                                  |
//! |----------------------------|------------------------------------------|
//! | `{base}/module/`           | collection new modules are created in    |
//! | `{base}/module/{id}/{ver}` | a module version, `latest` for the head  |
//! | `{base}/resource`          | collection new resource entries go to    |
//!
//! A resource's bytes do not travel through Atom: the entry created for it
//! carries a `blobstore` link, and the bytes are posted there as a multipart form.

use std::fmt;
use std::fs::File;
use std::io::{self, Read, Write};
use std::path::PathBuf;
use std::sync::Arc;

use url::Url;
use uuid::Uuid;

use crate::atom::{AtomClient, Content, Draft, Entry, REL_BLOBSTORE, REL_EDIT};
use crate::cancel::CancelToken;
use crate::container::Container;
use crate::envelope::Envelope;
use crate::error::{Error, ParseError, Result, TransportError};
use crate::manifest::{ResourceManifest, ResourceRecord};
use crate::pipe::pipe;
use crate::transport::{Method, Request, Transport};

/// Version name of a module's most recent revision.
pub const LATEST: &str = "latest";
/// The only status a blobstore answers a successful upload with.
pub const BLOBSTORE_OK: u16 = 302;
/// The form field carrying a resource's bytes.
const FORM_FIELD: &str = "file";
const COPY_CHUNK: usize = 8 * 1024;

type Source = Box<dyn Read + Send>;
type Opener = Box<dyn FnOnce() -> io::Result<Source> + Send>;

/// A named byte stream to be stored in the repository.
///
/// The stream is only opened once its upload starts, so resources waiting for
/// their turn hold no file descriptors.
pub struct Resource {
    name: String,
    open: Opener,
}

impl Resource {
    pub fn new(name: impl Into<String>, reader: impl Read + Send + 'static) -> Self {
        Resource::lazy(name, move || Ok(reader))
    }

    /// A resource whose stream is produced by `open` when the upload starts.
    pub fn lazy<R, F>(name: impl Into<String>, open: F) -> Self
    where
        R: Read + Send + 'static,
        F: FnOnce() -> io::Result<R> + Send + 'static,
    {
        Resource {
            name: name.into(),
            open: Box::new(move || Ok(Box::new(open()?) as Source)),
        }
    }

    /// A file, named after its base name and opened when its upload starts.
    pub fn file(path: impl Into<PathBuf>) -> io::Result<Self> {
        let path = path.into();
        let name = path
            .file_name()
            .ok_or_else(|| {
                io::Error::new(
                    io::ErrorKind::InvalidInput,
                    format!("{} does not name a file", path.display()),
                )
            })?
            .to_string_lossy()
            .into_owned();
        Ok(Resource::lazy(name, move || File::open(path)))
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    fn open(self) -> io::Result<(String, Source)> {
        let reader = (self.open)()?;
        Ok((self.name, reader))
    }
}

impl fmt::Debug for Resource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Resource")
            .field("name", &self.name)
            .finish_non_exhaustive()
    }
}

/// A module version as read back from the repository.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModuleContent {
    pub entry: Entry,
    /// The raw primary document.
    pub document: Vec<u8>,
    pub manifest: ResourceManifest,
}

/// A module repository reached through an [`AtomClient`].
#[derive(Debug)]
pub struct Repository<T: ?Sized> {
    client: AtomClient<T>,
    url: Url,
    id: String,
}

impl<T: Transport + ?Sized> Repository<T> {
    pub fn new(transport: Arc<T>, url: Url, id: impl Into<String>) -> Self {
        Repository {
            client: AtomClient::new(transport),
            url,
            id: id.into(),
        }
    }

    /// The identifier recorded in the manifest for resources stored here.
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Resolve `path` below the repository's base URL.
    pub fn endpoint(&self, path: &str) -> Result<Url> {
        let base = self.url.as_str().trim_end_matches('/');
        Ok(Url::parse(&format!("{base}/{path}"))?)
    }

    /// Create an empty module, returning the URL its versions are published to.
    pub fn create_module(&self) -> Result<Url> {
        let entry = self
            .client
            .create(&self.endpoint("module/")?, Draft::empty())?;
        tracing::info!(module = %entry.id, "created module");
        entry.link(REL_EDIT)
    }

    /// Fetch the entry of one version of a module.
    pub fn version_info(&self, module: &str, version: &str) -> Result<Entry> {
        self.client
            .fetch(&self.endpoint(&format!("module/{module}/{version}"))?)
    }

    /// The URL new versions of an existing module are published to.
    pub fn edit_url(&self, module: &str) -> Result<Url> {
        self.version_info(module, LATEST)?.link(REL_EDIT)
    }

    /// Store a single resource: open it, create its entry, then post its bytes
    /// to the blobstore link of that entry.
    pub fn upload_resource(&self, resource: Resource, cancel: &CancelToken) -> Result<ResourceRecord> {
        cancel.check()?;
        let (name, reader) = resource.open().map_err(TransportError::from)?;

        let entry = self
            .client
            .create(&self.endpoint("resource")?, Draft::titled(name.as_str()))?;
        let blobstore = entry.link(REL_BLOBSTORE)?;
        tracing::debug!(resource = %name, id = %entry.id, %blobstore, "created resource entry");

        cancel.check()?;
        let status = match self.post_blob(&blobstore, &name, reader, cancel) {
            Err(_) if cancel.is_cancelled() => return Err(Error::Cancelled),
            result => result?,
        };
        // a body cut short by cancellation may still have been answered
        cancel.check()?;
        if status != BLOBSTORE_OK {
            return Err(Error::Blobstore { name, status });
        }

        Ok(ResourceRecord {
            name,
            repository_id: self.id.clone(),
            resource_id: entry.id,
        })
    }

    fn post_blob(
        &self,
        url: &Url,
        name: &str,
        reader: Source,
        cancel: &CancelToken,
    ) -> Result<u16> {
        let boundary = Uuid::new_v4().simple().to_string();
        let content_type = format!("multipart/form-data; boundary={boundary}");
        let part = FormFile {
            boundary,
            filename: name.to_owned(),
            media_type: mime_guess::from_path(name)
                .first_or_octet_stream()
                .essence_str()
                .to_owned(),
        };
        let cancel = cancel.clone();
        let body = pipe(move |w| part.write(w, reader, &cancel));

        let request = Request::new(Method::Post, url.clone())
            .header("Content-Type", content_type)
            .body(body);
        let response = self.client.transport().send(request)?;
        Ok(response.status)
    }

    /// Replace the content of a module with a serialized container.
    pub fn upload_version(&self, edit: &Url, content: String) -> Result<Entry> {
        self.client
            .update(edit, Draft::with_content(Content::text(content)))
    }

    /// Fetch a module version and decode the container in its content.
    pub fn module_content(
        &self,
        module: &str,
        version: &str,
        envelope: Envelope,
    ) -> Result<ModuleContent> {
        let entry = self.version_info(module, version)?;
        let content = entry
            .content
            .as_ref()
            .ok_or(ParseError::Missing("content"))?;
        let (document, manifest) = Container::unpack(&content.body, envelope)?;
        let manifest = String::from_utf8(manifest).map_err(ParseError::from)?;
        Ok(ModuleContent {
            manifest: ResourceManifest::parse(&manifest)?,
            entry,
            document,
        })
    }
}

/// A single-part `multipart/form-data` body.
struct FormFile {
    boundary: String,
    filename: String,
    media_type: String,
}

impl FormFile {
    fn write(
        &self,
        w: &mut dyn Write,
        mut reader: impl Read,
        cancel: &CancelToken,
    ) -> io::Result<()> {
        write!(
            w,
            "--{}\r\nContent-Disposition: form-data; name=\"{FORM_FIELD}\"; filename=\"{}\"\r\n\
             Content-Type: {}\r\n\r\n",
            self.boundary,
            escape_quotes(&self.filename),
            self.media_type,
        )?;

        let mut buf = vec![0; COPY_CHUNK];
        loop {
            if cancel.is_cancelled() {
                return Err(io::Error::other("upload cancelled"));
            }
            let n = match reader.read(&mut buf) {
                Ok(0) => break,
                Ok(n) => n,
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => return Err(e),
            };
            w.write_all(&buf[..n])?;
        }

        write!(w, "\r\n--{}--\r\n", self.boundary)
    }
}

fn escape_quotes(s: &str) -> String {
    s.replace('\\', "\\\\").replace('"', "\\\"")
}
