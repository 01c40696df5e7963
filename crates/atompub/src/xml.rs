//! Just enough XML writing for the documents this crate produces. Parsing goes
//! through [`roxmltree`].
use std::borrow::Cow;
use std::io::{self, Write};

/// The declaration written ahead of every standalone document.
pub const HEADER: &str = "<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n";

fn escape(s: &str, attr: bool) -> Cow<'_, str> {
    let needs = |c: char| matches!(c, '&' | '<' | '>') || (attr && matches!(c, '"' | '\n' | '\t'));
    if !s.contains(needs) {
        return Cow::Borrowed(s);
    }
    let mut out = String::with_capacity(s.len() + 8);
    for c in s.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' if attr => out.push_str("&quot;"),
            '\n' if attr => out.push_str("&#xA;"),
            '\t' if attr => out.push_str("&#x9;"),
            c => out.push(c),
        }
    }
    Cow::Owned(out)
}

/// Escape character data.
pub fn text(s: &str) -> Cow<'_, str> {
    escape(s, false)
}

/// Escape a double-quoted attribute value.
pub fn attr(s: &str) -> Cow<'_, str> {
    escape(s, true)
}

/// Write `<name>value</name>`.
pub fn element(w: &mut dyn Write, name: &str, value: &str) -> io::Result<()> {
    write!(w, "<{name}>{}</{name}>", text(value))
}

/// The concatenated text content directly under `node`.
pub(crate) fn node_text(node: roxmltree::Node) -> String {
    node.children()
        .filter(|c| c.is_text())
        .filter_map(|c| c.text())
        .collect()
}

/// The first child element of `node` with the given local name.
pub(crate) fn child<'a, 'input>(
    node: roxmltree::Node<'a, 'input>,
    name: &str,
) -> Option<roxmltree::Node<'a, 'input>> {
    node.children()
        .find(|c| c.is_element() && c.tag_name().name() == name)
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn escapes_markup() {
        assert_eq!(text("a < b && c > d"), "a &lt; b &amp;&amp; c &gt; d");
        assert_eq!(attr("say \"hi\"\n"), "say &quot;hi&quot;&#xA;");
        assert!(matches!(text("plain"), Cow::Borrowed("plain")));
    }

    #[test]
    fn element_round_trips_through_parser() {
        let mut buf = Vec::new();
        element(&mut buf, "title", "<a & b>").unwrap();
        let xml = String::from_utf8(buf).unwrap();
        assert_eq!(xml, "<title>&lt;a &amp; b&gt;</title>");

        let doc = roxmltree::Document::parse(&xml).unwrap();
        assert_eq!(node_text(doc.root_element()), "<a & b>");
    }
}
