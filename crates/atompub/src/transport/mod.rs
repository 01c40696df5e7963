//! # Transport
//!
//! The publish pipeline only needs a blocking request/response exchange: a method,
//! a URL, a few headers and a streamed body out; a status, headers and a readable
//! body back. TLS, redirects and connection pooling belong to the implementation.
#[cfg(feature = "http")]
pub mod http;

use std::fmt;
use std::io::{self, Read};

use url::Url;

use crate::error::TransportError;

/// A streamed request or response body.
pub type Body = Box<dyn Read + Send>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Method {
    Get,
    Post,
    Put,
}

impl fmt::Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Method::Get => write!(f, "GET"),
            Method::Post => write!(f, "POST"),
            Method::Put => write!(f, "PUT"),
        }
    }
}

pub struct Request {
    pub method: Method,
    pub url: Url,
    pub headers: Vec<(String, String)>,
    pub body: Option<Body>,
}

impl Request {
    pub fn new(method: Method, url: Url) -> Self {
        Request {
            method,
            url,
            headers: Vec::new(),
            body: None,
        }
    }

    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    pub fn body(mut self, body: impl Read + Send + 'static) -> Self {
        self.body = Some(Box::new(body));
        self
    }
}

impl fmt::Debug for Request {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Request")
            .field("method", &self.method)
            .field("url", &self.url.as_str())
            .field("headers", &self.headers)
            .field("body", &self.body.is_some())
            .finish()
    }
}

/// A response whose body is drained when it goes out of scope, so the underlying
/// connection is always released, whatever path the caller returns through.
pub struct Response {
    pub status: u16,
    pub headers: Vec<(String, String)>,
    body: Body,
}

impl Response {
    pub fn new(status: u16, headers: Vec<(String, String)>, body: Body) -> Self {
        Response {
            status,
            headers,
            body,
        }
    }

    /// Read the whole body as UTF-8 text.
    pub fn text(&mut self) -> io::Result<String> {
        let mut text = String::new();
        self.body.read_to_string(&mut text)?;
        Ok(text)
    }

    /// Discard whatever is left of the body.
    pub fn drain(&mut self) -> io::Result<u64> {
        io::copy(&mut self.body, &mut io::sink())
    }
}

impl Read for Response {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        self.body.read(buf)
    }
}

impl Drop for Response {
    fn drop(&mut self) {
        if let Err(e) = self.drain() {
            tracing::trace!(error = %e, "failed to drain response body");
        }
    }
}

impl fmt::Debug for Response {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Response")
            .field("status", &self.status)
            .field("headers", &self.headers)
            .finish_non_exhaustive()
    }
}

/// A blocking HTTP exchange.
pub trait Transport: Send + Sync {
    /// Send `request` and return the response, whatever its status.
    ///
    /// Only failures to exchange bytes with the server are errors here; status
    /// handling belongs to the caller.
    fn send(&self, request: Request) -> Result<Response, TransportError>;
}

impl<T: Transport + ?Sized> Transport for std::sync::Arc<T> {
    fn send(&self, request: Request) -> Result<Response, TransportError> {
        (**self).send(request)
    }
}
