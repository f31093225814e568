use super::XmlDocument;
use super::dom::{Element, Node};

/// Serialize without XML declaration and without surrounding whitespace
pub(super) fn write_document(doc: &XmlDocument) -> String {
    let mut out = String::new();
    if let Some(doctype) = &doc.doctype {
        out.push_str(&doctype.to_declaration());
    }
    write_element(&mut out, &doc.root);
    out
}

pub(super) fn write_element(out: &mut String, element: &Element) {
    out.push('<');
    out.push_str(&element.name);
    for attr in &element.attributes {
        out.push(' ');
        out.push_str(&attr.name);
        out.push_str("=\"");
        out.push_str(&escape_attribute(&attr.value));
        out.push('"');
    }

    if element.children.is_empty() {
        out.push_str("/>");
        return;
    }

    out.push('>');
    for child in &element.children {
        write_node(out, child);
    }
    out.push_str("</");
    out.push_str(&element.name);
    out.push('>');
}

fn write_node(out: &mut String, node: &Node) {
    match node {
        Node::Element(element) => write_element(out, element),
        Node::Text(text) => out.push_str(&escape_text(text)),
        Node::CData(text) => {
            // "]]>" cannot appear inside a CDATA section
            out.push_str("<![CDATA[");
            out.push_str(&text.replace("]]>", "]]]]><![CDATA[>"));
            out.push_str("]]>");
        }
        Node::Comment(text) => {
            out.push_str("<!--");
            out.push_str(text);
            out.push_str("-->");
        }
        Node::ProcessingInstruction { target, content } => {
            out.push_str("<?");
            out.push_str(target);
            if !content.is_empty() {
                out.push(' ');
                out.push_str(content);
            }
            out.push_str("?>");
        }
    }
}

/// Escape character data. CR is written as a character reference so that
/// re-parsing does not normalize it away.
pub(crate) fn escape_text(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for ch in text.chars() {
        match ch {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '\r' => out.push_str("&#xD;"),
            _ => out.push(ch),
        }
    }
    out
}

/// Escape an attribute value for a double-quoted literal. Whitespace other
/// than space is written as character references to survive attribute-value
/// normalization.
pub(crate) fn escape_attribute(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    for ch in value.chars() {
        match ch {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '"' => out.push_str("&quot;"),
            '\t' => out.push_str("&#x9;"),
            '\n' => out.push_str("&#xA;"),
            '\r' => out.push_str("&#xD;"),
            _ => out.push(ch),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_round_trip_is_lossless() {
        let source = "<a b=\"1&amp;2&#xA;3\"><c>x &lt; y</c><d/><!--note--><?pi data?><![CDATA[<raw>]]></a>";
        let doc = XmlDocument::parse(source).unwrap();
        let written = doc.to_xml();
        assert_eq!(written, source);
        assert_eq!(XmlDocument::parse(&written).unwrap(), doc);
    }

    #[test]
    fn test_no_declaration_or_whitespace() {
        let doc = XmlDocument::parse("<?xml version=\"1.0\"?>\n<a/>\n").unwrap();
        assert_eq!(doc.to_xml(), "<a/>");
    }

    #[test]
    fn test_cdata_terminator_is_split() {
        let mut root = Element::new("a");
        root.push_child(Node::CData("x]]>y".into()));
        let doc = XmlDocument::from_root(root);
        let written = doc.to_xml();
        assert_eq!(written, "<a><![CDATA[x]]]]><![CDATA[>y]]></a>");
        assert_eq!(XmlDocument::parse(&written).unwrap().root().text(), "x]]>y");
    }
}
