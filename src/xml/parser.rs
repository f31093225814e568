use std::borrow::Cow;
use std::str;

use quick_xml::Reader;
use quick_xml::escape::unescape;
use quick_xml::events::{BytesStart, Event};
use tracing::trace;

use super::dom::{Attribute, Element, Node};
use super::{Doctype, Error, Result, XmlDocument};

/// Parse a complete document with exactly one root element
pub(super) fn parse_document(xml: &str) -> Result<XmlDocument> {
    let mut reader = Reader::from_str(xml);
    reader.config_mut().trim_text(false);

    let mut doctype = None;
    let mut stack: Vec<Element> = Vec::new();
    let mut root: Option<Element> = None;

    loop {
        match reader.read_event()? {
            Event::Decl(_) => {}
            Event::DocType(e) => {
                if root.is_some() || !stack.is_empty() {
                    return Err(Error::Malformed("DOCTYPE after the root element".into()));
                }
                if doctype.is_some() {
                    return Err(Error::Malformed("more than one DOCTYPE".into()));
                }
                doctype = Some(Doctype::parse(str::from_utf8(&e)?)?);
            }
            Event::Start(e) => {
                ensure_single_root(&stack, &root)?;
                stack.push(start_element(&e)?);
            }
            Event::Empty(e) => {
                ensure_single_root(&stack, &root)?;
                let element = start_element(&e)?;
                close_element(element, &mut stack, &mut root);
            }
            Event::End(_) => {
                let element = stack
                    .pop()
                    .ok_or_else(|| Error::Malformed("unexpected end tag".into()))?;
                close_element(element, &mut stack, &mut root);
            }
            Event::Text(e) => {
                let raw = str::from_utf8(&e)?;
                match stack.last_mut() {
                    Some(parent) => {
                        let text = unescape(&normalize_line_endings(raw))?.into_owned();
                        parent.push_child(Node::Text(text));
                    }
                    None if raw.trim().is_empty() => {}
                    None => {
                        return Err(Error::Malformed(
                            "character data outside the root element".into(),
                        ));
                    }
                }
            }
            Event::CData(e) => {
                let parent = stack
                    .last_mut()
                    .ok_or_else(|| Error::Malformed("CDATA outside the root element".into()))?;
                let text = normalize_line_endings(str::from_utf8(&e)?).into_owned();
                parent.push_child(Node::CData(text));
            }
            Event::Comment(e) => {
                if let Some(parent) = stack.last_mut() {
                    let text = normalize_line_endings(str::from_utf8(&e)?).into_owned();
                    parent.push_child(Node::Comment(text));
                }
            }
            Event::PI(e) => {
                if let Some(parent) = stack.last_mut() {
                    parent.push_child(Node::ProcessingInstruction {
                        target: str::from_utf8(e.target())?.to_string(),
                        content: str::from_utf8(e.content())?.trim_start().to_string(),
                    });
                }
            }
            Event::Eof => break,
        }
    }

    if let Some(open) = stack.last() {
        return Err(Error::Malformed(format!("unclosed element <{}>", open.name)));
    }
    let root = root.ok_or_else(|| Error::Malformed("no root element".into()))?;
    trace!("Parsed document with root <{}>", root.name);

    Ok(XmlDocument { doctype, root })
}

fn ensure_single_root(stack: &[Element], root: &Option<Element>) -> Result<()> {
    if stack.is_empty() && root.is_some() {
        return Err(Error::Malformed("more than one root element".into()));
    }
    Ok(())
}

fn close_element(element: Element, stack: &mut [Element], root: &mut Option<Element>) {
    match stack.last_mut() {
        Some(parent) => parent.push_child(element),
        None => *root = Some(element),
    }
}

fn start_element(e: &BytesStart) -> Result<Element> {
    let mut element = Element::new(str::from_utf8(e.name().as_ref())?);
    for attr in e.attributes() {
        let attr = attr?;
        let name = str::from_utf8(attr.key.as_ref())?;
        let raw = str::from_utf8(&attr.value)?;
        let value = unescape(&normalize_attribute_whitespace(raw))?.into_owned();
        element.attributes.push(Attribute::new(name, value));
    }
    Ok(element)
}

/// Normalize line endings to LF as a conforming XML processor does
fn normalize_line_endings(text: &str) -> Cow<'_, str> {
    if !text.contains('\r') {
        return Cow::Borrowed(text);
    }
    Cow::Owned(text.replace("\r\n", "\n").replace('\r', "\n"))
}

/// Attribute-value normalization for CDATA attributes: literal whitespace
/// characters become spaces. Character references are expanded afterwards
/// and therefore survive.
fn normalize_attribute_whitespace(raw: &str) -> Cow<'_, str> {
    if !raw.contains(['\t', '\n', '\r']) {
        return Cow::Borrowed(raw);
    }
    Cow::Owned(normalize_line_endings(raw).replace(['\t', '\n'], " "))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_nested_document() {
        let doc = parse_document(
            r#"<?xml version="1.0" encoding="UTF-8"?>
<samlp:Response xmlns:samlp="urn:oasis:names:tc:SAML:2.0:protocol" ID="_1"><saml:Issuer xmlns:saml="urn:oasis:names:tc:SAML:2.0:assertion">idp</saml:Issuer><Empty/></samlp:Response>"#,
        )
        .unwrap();

        let root = doc.root();
        assert_eq!(root.name, "samlp:Response");
        assert_eq!(root.attribute("ID"), Some("_1"));
        let children: Vec<_> = root.child_elements().map(|(_, e)| e.name.as_str()).collect();
        assert_eq!(children, ["saml:Issuer", "Empty"]);
        assert_eq!(root.text(), "idp");
    }

    #[test]
    fn test_entities_and_line_endings() {
        let doc = parse_document("<a b=\"x&amp;y&#xA;z\tw\">1 &lt; 2\r\n3</a>").unwrap();
        assert_eq!(doc.root().attribute("b"), Some("x&y\nz w"));
        assert_eq!(doc.root().text(), "1 < 2\n3");
    }

    #[test]
    fn test_rejects_multiple_roots() {
        let result = parse_document("<a/><b/>");
        assert!(matches!(result, Err(Error::Malformed(_))));
    }

    #[test]
    fn test_rejects_text_outside_root() {
        let result = parse_document("<a/>trailing");
        assert!(matches!(result, Err(Error::Malformed(_))));
    }

    #[test]
    fn test_rejects_unclosed_element() {
        assert!(parse_document("<a><b></b>").is_err());
    }

    #[test]
    fn test_rejects_mismatched_end_tag() {
        assert!(parse_document("<a><b></c></a>").is_err());
    }

    #[test]
    fn test_rejects_unknown_entity() {
        assert!(parse_document("<a>&undefined;</a>").is_err());
    }

    #[test]
    fn test_rejects_empty_input() {
        assert!(matches!(parse_document("  "), Err(Error::Malformed(_))));
    }

    #[test]
    fn test_keeps_doctype() {
        let doc =
            parse_document("<!DOCTYPE a [ <!ELEMENT a (#PCDATA)> <!ATTLIST a ID ID #IMPLIED> ]><a ID=\"x\"/>")
                .unwrap();
        let doctype = doc.doctype().unwrap();
        assert_eq!(doctype.name(), "a");
        assert_eq!(doctype.id_attributes_for("a").collect::<Vec<_>>(), ["ID"]);
    }

    #[test]
    fn test_comments_and_cdata_inside_root() {
        let doc = parse_document("<!-- outside --><a><!-- inside --><![CDATA[<raw>]]></a>").unwrap();
        assert_eq!(
            doc.root().children,
            vec![
                Node::Comment(" inside ".into()),
                Node::CData("<raw>".into())
            ]
        );
    }
}
