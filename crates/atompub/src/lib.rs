//! # AtomPub Publishing
//!
//! A client for publishing CNXML modules, together with the resources they
//! reference, to a module repository speaking AtomPub.
pub mod atom;
pub mod cancel;
pub mod container;
pub mod envelope;
pub mod error;
pub mod manifest;
pub mod pipe;
pub mod publish;
pub mod repo;
pub mod transport;
mod xml;

#[cfg(test)]
pub(crate) mod testkit;

pub use atom::{AtomClient, Draft, Entry};
pub use cancel::{cancel_pair, CancelHandle, CancelToken};
pub use container::Container;
pub use envelope::{Envelope, DEFAULT_ENVELOPE, DOUBLE_URL_SAFE_ENVELOPE};
pub use error::{Error, Result};
pub use manifest::{ResourceManifest, ResourceRecord};
pub use publish::{PublishConfig, PublishReport, Publisher, Target};
pub use repo::{Repository, Resource};
#[cfg(feature = "http")]
pub use transport::http::HttpTransport;
