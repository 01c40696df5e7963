//! # Atom Entries
//!
//! The repository speaks an AtomPub profile: modules and resources are Atom
//! entries, created by `POST`ing a draft to a collection and revised by `PUT`ing a
//! draft to the entry's `edit` link. This module holds the entry data model, the
//! drafts the client sends, and the XML mapping for both.
pub mod client;
#[cfg(test)]
mod tests;

use std::io::{self, Write};

use url::Url;

use crate::error::{Error, ParseError};
use crate::xml;

pub use client::AtomClient;

/// The Atom namespace.
pub const ATOM_NAMESPACE: &str = "http://www.w3.org/2005/Atom";
/// The media type of a single Atom entry.
pub const ATOM_ENTRY_TYPE: &str = r#"application/atom+xml;type=entry;charset="utf-8""#;

/// Relation of the link used to revise an entry.
pub const REL_EDIT: &str = "edit";
/// Relation of the link accepting a resource's bytes.
pub const REL_BLOBSTORE: &str = "blobstore";

/// A `(rel, href)` pair attached to an entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Link {
    pub rel: String,
    pub href: String,
}

/// The `content` element of an entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Content {
    /// The value of the `type` attribute, e.g. `text`.
    pub media_type: String,
    /// The character data, opaque to the client.
    pub body: String,
}

impl Content {
    /// Opaque text content.
    pub fn text(body: impl Into<String>) -> Self {
        Content {
            media_type: "text".into(),
            body: body.into(),
        }
    }
}

/// A snapshot of an entry as returned by the server.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Entry {
    pub id: String,
    pub title: Option<String>,
    pub links: Vec<Link>,
    pub content: Option<Content>,
}

impl Entry {
    /// The href of the first link with relation `rel`.
    pub fn url_for(&self, rel: &str) -> Option<&str> {
        self.links
            .iter()
            .find(|l| l.rel == rel)
            .map(|l| l.href.as_str())
    }

    /// Like [`Entry::url_for`], but a missing or unparsable link is an error.
    pub fn link(&self, rel: &str) -> Result<Url, Error> {
        let href = self.url_for(rel).ok_or_else(|| Error::MissingLink {
            rel: rel.to_owned(),
        })?;
        Ok(Url::parse(href)?)
    }

    /// Parse an entry document.
    pub fn parse(text: &str) -> Result<Self, ParseError> {
        let doc = roxmltree::Document::parse(text)?;
        let root = doc.root_element();
        if root.tag_name().name() != "entry" {
            return Err(ParseError::UnexpectedRoot {
                expected: "entry",
                found: root.tag_name().name().into(),
            });
        }

        let mut entry = Entry::default();
        let mut has_id = false;
        for node in root.children().filter(|n| n.is_element()) {
            match node.tag_name().name() {
                "id" if !has_id => {
                    entry.id = xml::node_text(node).trim().to_owned();
                    has_id = true;
                }
                "title" => entry.title = Some(xml::node_text(node)),
                "link" => {
                    if let (Some(rel), Some(href)) = (node.attribute("rel"), node.attribute("href"))
                    {
                        entry.links.push(Link {
                            rel: rel.to_owned(),
                            href: href.to_owned(),
                        });
                    }
                }
                "content" => {
                    entry.content = Some(Content {
                        media_type: node.attribute("type").unwrap_or("text").to_owned(),
                        body: xml::node_text(node),
                    })
                }
                _ => (),
            }
        }

        if !has_id {
            return Err(ParseError::Missing("id"));
        }
        Ok(entry)
    }
}

/// The payload of a create or update call.
///
/// A draft never carries an id or links; those are assigned by the server.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Draft {
    /// A bare entry, optionally titled.
    Entry { title: String },
    /// An entry carrying content.
    WithContent { title: String, content: Content },
}

impl Draft {
    /// An untitled entry without content, as used to create a module.
    pub fn empty() -> Self {
        Draft::Entry {
            title: String::new(),
        }
    }

    pub fn titled(title: impl Into<String>) -> Self {
        Draft::Entry {
            title: title.into(),
        }
    }

    pub fn with_content(content: Content) -> Self {
        Draft::WithContent {
            title: String::new(),
            content,
        }
    }

    pub fn title(&self) -> &str {
        match self {
            Draft::Entry { title } | Draft::WithContent { title, .. } => title,
        }
    }

    pub fn content(&self) -> Option<&Content> {
        match self {
            Draft::Entry { .. } => None,
            Draft::WithContent { content, .. } => Some(content),
        }
    }

    /// Write the draft as a standalone entry document.
    pub fn write_xml(&self, w: &mut dyn Write) -> io::Result<()> {
        w.write_all(xml::HEADER.as_bytes())?;
        write!(w, "<entry xmlns=\"{ATOM_NAMESPACE}\">")?;
        xml::element(w, "title", self.title())?;
        if let Some(content) = self.content() {
            write!(
                w,
                "<content type=\"{}\">{}</content>",
                xml::attr(&content.media_type),
                xml::text(&content.body)
            )?;
        }
        w.write_all(b"</entry>")
    }
}
