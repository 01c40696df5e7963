//! An in-memory repository for exercising the client without a network.
use std::collections::{HashMap, HashSet};
use std::io::{self, Cursor, Read};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use rand::Rng;
use url::Url;

use crate::atom::ATOM_NAMESPACE;
use crate::error::TransportError;
use crate::transport::{Method, Request, Response, Transport};
use crate::xml;

pub const BASE: &str = "http://repo.test/atompub";
pub const BLOBS: &str = "http://blobs.test/upload";

/// A request as the server saw it, body included.
#[derive(Debug, Clone)]
pub struct Recorded {
    pub method: Method,
    pub url: Url,
    pub headers: Vec<(String, String)>,
    pub body: Vec<u8>,
}

impl Recorded {
    fn read(request: Request) -> io::Result<Self> {
        let mut body = Vec::new();
        if let Some(mut reader) = request.body {
            reader.read_to_end(&mut body)?;
        }
        Ok(Recorded {
            method: request.method,
            url: request.url,
            headers: request.headers,
            body,
        })
    }

    pub fn text(&self) -> &str {
        std::str::from_utf8(&self.body).unwrap()
    }

    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }
}

pub fn respond(status: u16, body: impl Into<String>) -> Response {
    Response::new(status, Vec::new(), Box::new(Cursor::new(body.into().into_bytes())))
}

pub fn entry_xml(id: &str, links: &[(&str, &str)], content: Option<&str>) -> String {
    let mut out = format!(
        "<?xml version=\"1.0\"?><entry xmlns=\"{ATOM_NAMESPACE}\"><id>{}</id>",
        xml::text(id)
    );
    for (rel, href) in links {
        out.push_str(&format!(
            "<link rel=\"{}\" href=\"{}\"/>",
            xml::attr(rel),
            xml::attr(href)
        ));
    }
    if let Some(content) = content {
        out.push_str(&format!("<content type=\"text\">{}</content>", xml::text(content)));
    }
    out.push_str("</entry>");
    out
}

/// A transport answering every request with a closure.
pub struct FnTransport<F>(pub F);

impl<F> Transport for FnTransport<F>
where
    F: Fn(Recorded) -> Response + Send + Sync,
{
    fn send(&self, request: Request) -> Result<Response, TransportError> {
        Ok((self.0)(Recorded::read(request)?))
    }
}

#[derive(Debug, Default)]
struct State {
    modules: HashMap<String, Option<String>>,
    blobs: Vec<(String, Recorded)>,
    requests: Vec<(Method, String)>,
}

/// A fake module repository with a blobstore.
///
/// * `POST module/` creates `module-N` and answers 201.
/// * `GET module/{id}/{version}` answers the module's entry, 404 if unknown.
/// * `POST resource` answers an entry `res-{title}` with a blobstore link.
/// * `POST` to a blobstore link answers 302 unless the resource is set to fail.
/// * `PUT module/{id}/edit` stores the content and echoes it.
#[derive(Debug, Default)]
pub struct StubRepo {
    state: Mutex<State>,
    blob_status: HashMap<String, u16>,
    broken_entries: HashSet<String>,
    delay: Option<(Duration, Duration)>,
    in_flight: AtomicUsize,
    peak: AtomicUsize,
}

impl StubRepo {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn base() -> Url {
        Url::parse(BASE).unwrap()
    }

    /// Make the blobstore answer `status` when `name` is uploaded.
    pub fn blob_status(mut self, name: &str, status: u16) -> Self {
        self.blob_status.insert(name.into(), status);
        self
    }

    /// Make the creation of `name`'s resource entry fail with a 500.
    pub fn broken_entry(mut self, name: &str) -> Self {
        self.broken_entries.insert(name.into());
        self
    }

    /// Delay every blob upload by a random amount up to `max`.
    pub fn jitter(mut self, max: Duration) -> Self {
        self.delay = Some((Duration::ZERO, max));
        self
    }

    /// Delay every blob upload by exactly `delay`.
    pub fn latency(mut self, delay: Duration) -> Self {
        self.delay = Some((delay, delay));
        self
    }

    pub fn with_module(self, id: &str, content: Option<&str>) -> Self {
        self.state
            .lock()
            .unwrap()
            .modules
            .insert(id.into(), content.map(Into::into));
        self
    }

    /// Names of the resources whose bytes reached the blobstore, in arrival order.
    pub fn blob_names(&self) -> Vec<String> {
        let state = self.state.lock().unwrap();
        state.blobs.iter().map(|(name, _)| name.clone()).collect()
    }

    pub fn blob(&self, name: &str) -> Option<Recorded> {
        let state = self.state.lock().unwrap();
        state
            .blobs
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, r)| r.clone())
    }

    pub fn module_content(&self, id: &str) -> Option<String> {
        self.state.lock().unwrap().modules.get(id).cloned().flatten()
    }

    pub fn requests(&self) -> Vec<(Method, String)> {
        self.state.lock().unwrap().requests.clone()
    }

    /// The highest number of blob uploads seen in flight at once.
    pub fn peak_uploads(&self) -> usize {
        self.peak.load(Ordering::SeqCst)
    }

    fn route(&self, req: Recorded) -> Response {
        let url = req.url.as_str().to_owned();
        self.state
            .lock()
            .unwrap()
            .requests
            .push((req.method, url.clone()));

        if let Some(name) = url.strip_prefix(&format!("{BLOBS}/")) {
            return self.store_blob(name.to_owned(), req);
        }
        let Some(path) = url.strip_prefix(&format!("{BASE}/")) else {
            return respond(404, "");
        };
        let segments: Vec<&str> = path.split('/').collect();

        match (req.method, segments.as_slice()) {
            (Method::Post, ["module", ""]) => {
                let mut state = self.state.lock().unwrap();
                let id = format!("module-{}", state.modules.len() + 1);
                state.modules.insert(id.clone(), None);
                respond(201, self.module_entry(&id, None))
            }
            (Method::Get, ["module", id, _version]) => {
                let state = self.state.lock().unwrap();
                match state.modules.get(*id) {
                    Some(content) => respond(200, self.module_entry(id, content.as_deref())),
                    None => respond(404, ""),
                }
            }
            (Method::Put, ["module", id, "edit"]) => {
                let Ok(entry) = parse_draft(req.text()) else {
                    return respond(400, "");
                };
                let mut state = self.state.lock().unwrap();
                match state.modules.get_mut(*id) {
                    Some(slot) => {
                        *slot = entry.content.clone();
                        respond(200, self.module_entry(id, entry.content.as_deref()))
                    }
                    None => respond(404, ""),
                }
            }
            (Method::Post, ["resource"]) => {
                let Ok(entry) = parse_draft(req.text()) else {
                    return respond(400, "");
                };
                if self.broken_entries.contains(&entry.title) {
                    return respond(500, "");
                }
                let id = format!("res-{}", entry.title);
                let blob = format!("{BLOBS}/{}", entry.title);
                let edit = format!("{BASE}/resource/{}", entry.title);
                respond(
                    201,
                    entry_xml(&id, &[("edit", &edit), ("blobstore", &blob)], None),
                )
            }
            _ => respond(404, ""),
        }
    }

    fn store_blob(&self, name: String, req: Recorded) -> Response {
        let status = self.blob_status.get(&name).copied().unwrap_or(302);
        self.state.lock().unwrap().blobs.push((name, req));
        let mut response = respond(status, "");
        if status == 302 {
            response.headers.push(("Location".into(), format!("{BASE}/done")));
        }
        response
    }

    fn module_entry(&self, id: &str, content: Option<&str>) -> String {
        let edit = format!("{BASE}/module/{id}/edit");
        entry_xml(id, &[("edit", &edit)], content)
    }
}

impl Transport for StubRepo {
    fn send(&self, request: Request) -> Result<Response, TransportError> {
        let is_blob = request.url.as_str().starts_with(BLOBS);
        if is_blob {
            let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
            self.peak.fetch_max(now, Ordering::SeqCst);
            if let Some((min, max)) = self.delay {
                let millis =
                    rand::thread_rng().gen_range(min.as_millis() as u64..=max.as_millis() as u64);
                std::thread::sleep(Duration::from_millis(millis));
            }
        }
        let recorded = Recorded::read(request);
        if is_blob {
            self.in_flight.fetch_sub(1, Ordering::SeqCst);
        }
        Ok(self.route(recorded?))
    }
}

struct DraftFields {
    title: String,
    content: Option<String>,
}

fn parse_draft(text: &str) -> Result<DraftFields, roxmltree::Error> {
    let doc = roxmltree::Document::parse(text)?;
    let root = doc.root_element();
    let field = |name| xml::child(root, name).map(xml::node_text);
    Ok(DraftFields {
        title: field("title").unwrap_or_default(),
        content: field("content"),
    })
}
