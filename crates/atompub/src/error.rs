//! # Publishing Errors
//!
//! This module contains the error types for failures that might occur while talking to
//! the repository or while encoding and decoding the payloads exchanged with it.
use std::fmt;
use std::io;

use thiserror::Error;
use url::Url;

/// The protocol operation that observed an unexpected status.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Op {
    /// `POST` of a draft entry to a collection.
    Create,
    /// `PUT` of a draft entry to an edit URL.
    Update,
    /// `GET` of an existing entry.
    Fetch,
}

impl fmt::Display for Op {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Op::Create => write!(f, "create"),
            Op::Update => write!(f, "update"),
            Op::Fetch => write!(f, "fetch"),
        }
    }
}

/// The error representing a failure at any step of a publish.
#[derive(Error, Debug)]
pub enum Error {
    /// A create, update or fetch received a status outside the accepted set.
    #[error("{op} {url}: server returned status code {status}")]
    Status {
        /// The URL the request was sent to.
        url: Url,
        /// The operation that was attempted.
        op: Op,
        /// The status code the server answered with.
        status: u16,
    },
    /// The blobstore did not acknowledge a resource upload with a redirect.
    #[error("blobstore: got status code {status} for {name}")]
    Blobstore {
        /// The base name of the resource being uploaded.
        name: String,
        /// The status code the blobstore answered with.
        status: u16,
    },
    /// A transparent wrapper for a [`TransportError`].
    #[error(transparent)]
    Transport(#[from] TransportError),
    /// An outgoing document could not be serialized.
    #[error("failed to marshal {what}")]
    Marshal {
        /// The kind of document being written.
        what: &'static str,
        /// The underlying write failure.
        #[source]
        source: io::Error,
    },
    /// A transparent wrapper for a [`ParseError`].
    #[error(transparent)]
    Parse(#[from] ParseError),
    /// The entry returned by the server carries no link with the wanted relation.
    #[error("entry has no link with rel=\"{rel}\"")]
    MissingLink {
        /// The relation that was looked up.
        rel: String,
    },
    /// A transparent wrapper for a [`url::ParseError`].
    #[error(transparent)]
    InvalidUrl(#[from] url::ParseError),
    /// A transparent wrapper for a [`std::io::Error`] raised locally.
    #[error(transparent)]
    Io(#[from] io::Error),
    /// Resources were mandatory but some of them failed to upload.
    #[error("{failed} resource(s) failed to upload, refusing to publish the module")]
    ResourcesFailed {
        /// The number of resources that were not uploaded.
        failed: usize,
    },
    /// The publish was cancelled before it completed.
    #[error("publish cancelled")]
    Cancelled,
    /// A transparent wrapper for a [`tokio::task::JoinError`]
    #[error(transparent)]
    JoinFailed(#[from] tokio::task::JoinError),
}

/// An error raised while moving bytes to or from the repository.
#[derive(Error, Debug)]
pub enum TransportError {
    /// A transparent wrapper for a [`reqwest::Error`].
    #[cfg(feature = "http")]
    #[error(transparent)]
    Http(#[from] reqwest::Error),
    /// A transparent wrapper for a [`std::io::Error`].
    #[error(transparent)]
    Io(#[from] io::Error),
}

/// An error raised while decoding a document received from, or published to, the repository.
#[derive(Error, Debug)]
pub enum ParseError {
    /// A transparent wrapper for a [`roxmltree::Error`].
    #[error(transparent)]
    Xml(#[from] roxmltree::Error),
    /// The document is not UTF-8.
    #[error("document is not valid UTF-8")]
    Utf8(#[from] std::string::FromUtf8Error),
    /// The base64 envelope could not be decoded.
    #[error("invalid base64 envelope")]
    Envelope(#[source] io::Error),
    /// The document root is not the expected element.
    #[error("expected <{expected}> root element, found <{found}>")]
    UnexpectedRoot {
        /// The local name of the element that was expected.
        expected: &'static str,
        /// The local name of the element that was found.
        found: String,
    },
    /// A required element or attribute is absent.
    #[error("missing <{0}>")]
    Missing(&'static str),
}

impl Error {
    /// Warn the user about an error with its structured context.
    pub fn warn(&self) {
        match self {
            Error::Status { url, op, status } => {
                tracing::warn!(message = %self, %url, %op, status)
            }
            Error::Blobstore { name, status } => {
                tracing::warn!(message = %self, resource = %name, status)
            }
            Error::MissingLink { rel } => tracing::warn!(message = %self, rel = %rel),
            Error::ResourcesFailed { failed } => tracing::warn!(message = %self, failed),
            Error::Cancelled => (),
            _ => tracing::warn!(message = %self),
        }
    }
}

/// The Result type used throughout the publish pipeline.
pub type Result<T, E = Error> = std::result::Result<T, E>;
