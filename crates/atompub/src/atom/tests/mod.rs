use std::io::{self, Read};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use url::Url;

use super::*;
use crate::error::Op;
use crate::testkit::{entry_xml, respond, FnTransport, Recorded};
use crate::transport::{Method, Response};

fn entry_with(links: &[(&str, &str)]) -> Entry {
    Entry {
        id: "e1".into(),
        links: links
            .iter()
            .map(|(rel, href)| Link {
                rel: (*rel).into(),
                href: (*href).into(),
            })
            .collect(),
        ..Default::default()
    }
}

fn url(s: &str) -> Url {
    Url::parse(s).unwrap()
}

fn client_answering(status: u16) -> AtomClient<FnTransport<impl Fn(Recorded) -> Response>> {
    AtomClient::new(Arc::new(FnTransport(move |_: Recorded| {
        respond(status, entry_xml("urn:e1", &[("edit", "http://h/e1")], None))
    })))
}

#[test]
fn url_for_returns_first_match() {
    let entry = entry_with(&[("edit", "A"), ("alternate", "X"), ("edit", "B")]);
    assert_eq!(entry.url_for("edit"), Some("A"));
    assert_eq!(entry.url_for("alternate"), Some("X"));
}

#[test]
fn url_for_missing_rel() {
    let entry = entry_with(&[("edit", "A")]);
    assert_eq!(entry.url_for("blobstore"), None);
    assert!(matches!(
        entry.link("blobstore"),
        Err(Error::MissingLink { rel }) if rel == "blobstore"
    ));
}

#[test]
fn link_must_be_absolute() {
    let entry = entry_with(&[("edit", "relative/path")]);
    assert!(matches!(entry.link("edit"), Err(Error::InvalidUrl(_))));
}

#[test]
fn parse_reads_id_title_links_and_content() {
    let text = r#"<?xml version="1.0"?>
        <entry xmlns="http://www.w3.org/2005/Atom">
          <id> urn:module:42 </id>
          <title>Cell &amp; Membrane</title>
          <link rel="edit" href="http://repo/module/42/edit"/>
          <link rel="blobstore" href="http://blobs/42"/>
          <link href="http://no-rel"/>
          <content type="text">aGVsbG8=</content>
          <author><name>ignored</name></author>
        </entry>"#;

    let entry = Entry::parse(text).unwrap();
    assert_eq!(entry.id, "urn:module:42");
    assert_eq!(entry.title.as_deref(), Some("Cell & Membrane"));
    assert_eq!(entry.links.len(), 2);
    assert_eq!(entry.url_for(REL_BLOBSTORE), Some("http://blobs/42"));
    assert_eq!(entry.content, Some(Content::text("aGVsbG8=")));
}

#[test]
fn parse_rejects_non_entries() {
    assert!(matches!(
        Entry::parse("<feed/>"),
        Err(ParseError::UnexpectedRoot { expected: "entry", .. })
    ));
    assert!(matches!(
        Entry::parse("<entry><title/></entry>"),
        Err(ParseError::Missing("id"))
    ));
    assert!(matches!(Entry::parse("<entry>"), Err(ParseError::Xml(_))));
}

#[test]
fn drafts_render_as_entry_documents() {
    let mut buf = Vec::new();
    Draft::titled("fig<1>.png").write_xml(&mut buf).unwrap();
    insta::assert_snapshot!(String::from_utf8(buf).unwrap(), @r#"
    <?xml version="1.0" encoding="UTF-8"?>
    <entry xmlns="http://www.w3.org/2005/Atom"><title>fig&lt;1&gt;.png</title></entry>
    "#);

    let mut buf = Vec::new();
    Draft::with_content(Content::text("YQ=="))
        .write_xml(&mut buf)
        .unwrap();
    insta::assert_snapshot!(String::from_utf8(buf).unwrap(), @r#"
    <?xml version="1.0" encoding="UTF-8"?>
    <entry xmlns="http://www.w3.org/2005/Atom"><title></title><content type="text">YQ==</content></entry>
    "#);
}

#[test]
fn create_and_update_accept_200_and_201() {
    for status in [200, 201] {
        let client = client_answering(status);
        let target = url("http://h/collection/");
        assert_eq!(client.create(&target, Draft::empty()).unwrap().id, "urn:e1");
        assert_eq!(client.update(&target, Draft::empty()).unwrap().id, "urn:e1");
    }
}

#[test]
fn other_statuses_are_errors() {
    for status in [202, 204, 302, 404, 500] {
        let client = client_answering(status);
        let target = url("http://h/collection/");

        match client.create(&target, Draft::empty()) {
            Err(Error::Status { url, op, status: got }) => {
                assert_eq!(url, target);
                assert_eq!(op, Op::Create);
                assert_eq!(got, status);
            }
            other => panic!("expected a status error, got {other:?}"),
        }
        match client.update(&target, Draft::empty()) {
            Err(e @ Error::Status { op: Op::Update, .. }) => {
                assert!(e.to_string().starts_with("update http://h/collection/"));
            }
            other => panic!("expected a status error, got {other:?}"),
        }
    }
}

#[test]
fn fetch_only_accepts_200() {
    assert!(client_answering(200).fetch(&url("http://h/e1")).is_ok());
    assert!(matches!(
        client_answering(201).fetch(&url("http://h/e1")),
        Err(Error::Status { op: Op::Fetch, status: 201, .. })
    ));
}

#[test]
fn requests_carry_the_draft_and_media_type() {
    let client = AtomClient::new(Arc::new(FnTransport(|req: Recorded| {
        assert_eq!(req.method, Method::Post);
        assert_eq!(req.header("content-type"), Some(ATOM_ENTRY_TYPE));
        assert!(req.text().contains("<title>notes.txt</title>"));
        respond(201, entry_xml("r1", &[], None))
    })));
    client
        .create(&url("http://h/resource"), Draft::titled("notes.txt"))
        .unwrap();
}

#[test]
fn unparsable_success_body_is_a_parse_error() {
    let client = AtomClient::new(Arc::new(FnTransport(|_: Recorded| respond(201, "not xml"))));
    assert!(matches!(
        client.create(&url("http://h/c"), Draft::empty()),
        Err(Error::Parse(ParseError::Xml(_)))
    ));
}

struct Tracked {
    left: usize,
    drained: Arc<AtomicBool>,
}

impl Read for Tracked {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        if self.left == 0 {
            self.drained.store(true, Ordering::SeqCst);
            return Ok(0);
        }
        let n = buf.len().min(self.left);
        buf[..n].fill(b'x');
        self.left -= n;
        Ok(n)
    }
}

#[test]
fn response_body_is_released_on_error_paths() {
    let drained = Arc::new(AtomicBool::new(false));
    let flag = Arc::clone(&drained);
    let client = AtomClient::new(Arc::new(FnTransport(move |_: Recorded| {
        let body = Tracked {
            left: 64 * 1024,
            drained: Arc::clone(&flag),
        };
        Response::new(500, Vec::new(), Box::new(body))
    })));

    assert!(client.create(&url("http://h/c"), Draft::empty()).is_err());
    assert!(drained.load(Ordering::SeqCst));
}
