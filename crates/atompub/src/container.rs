//! # Container Codec
//!
//! A module version is published as a single Atom entry whose `content` is opaque
//! text. Two documents have to fit in there: the module's CNXML and the resource
//! manifest. Each is base64 encoded on its own, wrapped in a small XML fragment,
//! and the fragment is then encoded once more as a whole:
//!
//! ```text
//! envelope(
//!   <resource-entry-value>
//!     <cnxml-doc>envelope(document)</cnxml-doc>
//!     <resource-mapping-doc>envelope(manifest)</resource-mapping-doc>
//!   </resource-entry-value>
//! )
//! ```

use std::io::{self, Read, Write};

use crate::envelope::Envelope;
use crate::error::ParseError;
use crate::pipe::pipe;
use crate::xml;

const ROOT: &str = "resource-entry-value";
const DOCUMENT: &str = "cnxml-doc";
const MANIFEST: &str = "resource-mapping-doc";

/// The two encoded blobs that make up a module version's content.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Container {
    envelope: Envelope,
    document: String,
    manifest: String,
}

impl Container {
    /// Consume both streams and encode each of them with `envelope`.
    pub fn build<D, M>(document: D, manifest: M, envelope: Envelope) -> io::Result<Self>
    where
        D: Read,
        M: Read,
    {
        let document = envelope.encode(document)?;
        let manifest = envelope.encode(manifest)?;
        Ok(Container {
            envelope,
            document,
            manifest,
        })
    }

    fn write_xml(&self, w: &mut dyn Write) -> io::Result<()> {
        write!(w, "<{ROOT}>")?;
        xml::element(w, DOCUMENT, &self.document)?;
        xml::element(w, MANIFEST, &self.manifest)?;
        write!(w, "</{ROOT}>")
    }

    /// Render the container fragment and encode it as a whole, producing the text
    /// that goes into the Atom `content` element.
    pub fn serialize(self) -> io::Result<String> {
        let envelope = self.envelope;
        envelope.encode(pipe(move |w| self.write_xml(w)))
    }

    /// Reverse [`Container::serialize`] followed by [`Container::build`], returning
    /// the raw document and manifest bytes.
    ///
    /// A layer count that does not match the one used to publish fails here, either
    /// while decoding the outer layer or while parsing the fragment it produced.
    pub fn unpack(text: &str, envelope: Envelope) -> Result<(Vec<u8>, Vec<u8>), ParseError> {
        let fragment = String::from_utf8(envelope.decode(text.as_bytes())?)?;
        let doc = roxmltree::Document::parse(&fragment)?;
        let root = doc.root_element();
        if root.tag_name().name() != ROOT {
            return Err(ParseError::UnexpectedRoot {
                expected: ROOT,
                found: root.tag_name().name().into(),
            });
        }

        let field = |name: &'static str| -> Result<Vec<u8>, ParseError> {
            let node = xml::child(root, name).ok_or(ParseError::Missing(name))?;
            envelope.decode(xml::node_text(node).as_bytes())
        };

        Ok((field(DOCUMENT)?, field(MANIFEST)?))
    }
}
