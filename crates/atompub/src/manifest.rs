//! # Resource Manifest
//!
//! The resource mapping document tells readers of a published module where each
//! of its resources now lives in the repository:
//!
//! ```xml
//! <resources version="1">
//!   <resource name="figure.png">
//!     <location-information>
//!       <repository>
//!         <repository-id>cnx-repo</repository-id>
//!         <resource-id>…</resource-id>
//!       </repository>
//!     </location-information>
//!   </resource>
//! </resources>
//! ```
//!
//! Records are kept in the order uploads completed, which differs between runs.
use std::io::{self, Write};

use serde::Serialize;

use crate::error::ParseError;
use crate::pipe::{pipe, PipeReader};
use crate::xml;

/// The manifest format version spoken by this client.
pub const MANIFEST_VERSION: &str = "1";

/// Where a single uploaded resource lives in the repository.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ResourceRecord {
    /// The base name of the original file.
    pub name: String,
    /// The repository the resource was uploaded to.
    pub repository_id: String,
    /// The identifier of the resource entry the server created.
    pub resource_id: String,
}

/// A versioned, ordered list of [`ResourceRecord`]s.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ResourceManifest {
    version: String,
    records: Vec<ResourceRecord>,
}

impl Default for ResourceManifest {
    fn default() -> Self {
        ResourceManifest {
            version: MANIFEST_VERSION.into(),
            records: Vec::new(),
        }
    }
}

impl ResourceManifest {
    /// An empty manifest at the current format version.
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, record: ResourceRecord) {
        self.records.push(record);
    }

    pub fn version(&self) -> &str {
        &self.version
    }

    pub fn records(&self) -> &[ResourceRecord] {
        &self.records
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Look a record up by resource name.
    pub fn get(&self, name: &str) -> Option<&ResourceRecord> {
        self.records.iter().find(|r| r.name == name)
    }

    /// Write the manifest as a standalone XML document.
    pub fn write_xml(&self, w: &mut dyn Write) -> io::Result<()> {
        w.write_all(xml::HEADER.as_bytes())?;
        write!(w, "<resources version=\"{}\">", xml::attr(&self.version))?;
        for record in &self.records {
            write!(w, "<resource name=\"{}\">", xml::attr(&record.name))?;
            w.write_all(b"<location-information><repository>")?;
            xml::element(w, "repository-id", &record.repository_id)?;
            xml::element(w, "resource-id", &record.resource_id)?;
            w.write_all(b"</repository></location-information></resource>")?;
        }
        w.write_all(b"</resources>")
    }

    /// Consume the manifest, returning a stream over its serialized form.
    pub fn into_reader(self) -> PipeReader {
        pipe(move |w| self.write_xml(w))
    }

    /// Parse a manifest document.
    pub fn parse(text: &str) -> Result<Self, ParseError> {
        let doc = roxmltree::Document::parse(text)?;
        let root = doc.root_element();
        if root.tag_name().name() != "resources" {
            return Err(ParseError::UnexpectedRoot {
                expected: "resources",
                found: root.tag_name().name().into(),
            });
        }

        let version = root
            .attribute("version")
            .ok_or(ParseError::Missing("resources version"))?
            .to_owned();

        let mut records = Vec::new();
        for node in root
            .children()
            .filter(|n| n.is_element() && n.tag_name().name() == "resource")
        {
            let name = node
                .attribute("name")
                .ok_or(ParseError::Missing("resource name"))?;
            let repo = xml::child(node, "location-information")
                .and_then(|n| xml::child(n, "repository"))
                .ok_or(ParseError::Missing("location-information"))?;
            let repository_id = xml::child(repo, "repository-id")
                .map(xml::node_text)
                .ok_or(ParseError::Missing("repository-id"))?;
            let resource_id = xml::child(repo, "resource-id")
                .map(xml::node_text)
                .ok_or(ParseError::Missing("resource-id"))?;
            records.push(ResourceRecord {
                name: name.to_owned(),
                repository_id,
                resource_id,
            });
        }

        Ok(ResourceManifest { version, records })
    }
}

impl Extend<ResourceRecord> for ResourceManifest {
    fn extend<T: IntoIterator<Item = ResourceRecord>>(&mut self, iter: T) {
        self.records.extend(iter)
    }
}
