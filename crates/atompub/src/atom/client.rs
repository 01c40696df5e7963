//! Create, update and fetch entries.
use std::sync::Arc;

use url::Url;

use super::{Draft, Entry, ATOM_ENTRY_TYPE};
use crate::error::{Error, Op, Result, TransportError};
use crate::pipe::pipe;
use crate::transport::{Method, Request, Response, Transport};

/// Statuses accepted for create and update.
const WRITE_OK: [u16; 2] = [200, 201];

/// An AtomPub client over a shared [`Transport`].
#[derive(Debug)]
pub struct AtomClient<T: ?Sized> {
    transport: Arc<T>,
}

impl<T: ?Sized> Clone for AtomClient<T> {
    fn clone(&self) -> Self {
        AtomClient {
            transport: Arc::clone(&self.transport),
        }
    }
}

impl<T: Transport + ?Sized> AtomClient<T> {
    pub fn new(transport: Arc<T>) -> Self {
        AtomClient { transport }
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    /// `POST` a draft to a collection, returning the entry the server created.
    pub fn create(&self, collection: &Url, draft: Draft) -> Result<Entry> {
        self.submit(Op::Create, Method::Post, collection, draft)
    }

    /// `PUT` a draft to an entry's edit URL, returning the revised entry.
    pub fn update(&self, entry: &Url, draft: Draft) -> Result<Entry> {
        self.submit(Op::Update, Method::Put, entry, draft)
    }

    /// `GET` an entry.
    pub fn fetch(&self, url: &Url) -> Result<Entry> {
        let request = Request::new(Method::Get, url.clone()).header("Accept", ATOM_ENTRY_TYPE);
        let response = self.transport.send(request)?;
        expect_entry(Op::Fetch, url, response, &[200])
    }

    fn submit(&self, op: Op, method: Method, url: &Url, draft: Draft) -> Result<Entry> {
        tracing::debug!(%op, %url, title = draft.title(), "submitting entry");
        let body = pipe(move |w| draft.write_xml(w));
        let request = Request::new(method, url.clone())
            .header("Content-Type", ATOM_ENTRY_TYPE)
            .body(body);
        let response = self.transport.send(request)?;
        expect_entry(op, url, response, &WRITE_OK)
    }
}

/// Validate the status and parse the entry out of `response`. The body is
/// released on every path when `response` drops.
fn expect_entry(op: Op, url: &Url, mut response: Response, accept: &[u16]) -> Result<Entry> {
    if !accept.contains(&response.status) {
        return Err(Error::Status {
            url: url.clone(),
            op,
            status: response.status,
        });
    }
    let text = response.text().map_err(TransportError::Io)?;
    Ok(Entry::parse(&text)?)
}
