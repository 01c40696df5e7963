//! [`Transport`] over [`reqwest::blocking`].
use std::time::Duration;

use reqwest::blocking::{Body, Client};
use reqwest::redirect::Policy;

use super::{Method, Request, Response, Transport};
use crate::error::TransportError;

const USER_AGENT: &str = concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION"));

/// An HTTP transport.
///
/// Redirects are never followed: the blobstore acknowledges uploads with a
/// `302 Found`, and that status has to reach the client as is.
#[derive(Debug, Clone)]
pub struct HttpTransport {
    client: Client,
}

impl HttpTransport {
    pub fn new() -> Result<Self, TransportError> {
        Self::with_timeout(None)
    }

    /// Build a transport whose requests give up after `timeout`.
    pub fn with_timeout(timeout: Option<Duration>) -> Result<Self, TransportError> {
        let client = Client::builder()
            .redirect(Policy::none())
            .user_agent(USER_AGENT)
            .timeout(timeout)
            .build()?;
        Ok(HttpTransport { client })
    }
}

impl Transport for HttpTransport {
    fn send(&self, request: Request) -> Result<Response, TransportError> {
        let Request {
            method,
            url,
            headers,
            body,
        } = request;

        tracing::debug!(%method, %url, "sending request");

        let method = match method {
            Method::Get => reqwest::Method::GET,
            Method::Post => reqwest::Method::POST,
            Method::Put => reqwest::Method::PUT,
        };

        let mut builder = self.client.request(method, url);
        for (name, value) in headers {
            builder = builder.header(name, value);
        }
        if let Some(body) = body {
            // unknown length: sent chunked, straight from the stream
            builder = builder.body(Body::new(body));
        }

        let response = builder.send()?;
        let status = response.status().as_u16();
        let headers = response
            .headers()
            .iter()
            .filter_map(|(k, v)| Some((k.as_str().to_owned(), v.to_str().ok()?.to_owned())))
            .collect();

        tracing::trace!(status, "received response");

        Ok(Response::new(status, headers, Box::new(response)))
    }
}
