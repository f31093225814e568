//! Canonical XML 1.0 and Exclusive XML Canonicalization 1.0 over the owned
//! tree. The subtree rooted at the given element is the document subset;
//! namespaces in scope from its ancestors, and for the inclusive methods
//! their `xml:*` attributes, are passed in by the caller.

use std::collections::{BTreeMap, BTreeSet};

use super::dom::{Attribute, Element, Node, split_qname};
use super::{NamespaceScope, Result};

pub const C14N_10: &str = "http://www.w3.org/TR/2001/REC-xml-c14n-20010315";
pub const C14N_10_WITH_COMMENTS: &str =
    "http://www.w3.org/TR/2001/REC-xml-c14n-20010315#WithComments";
pub const EXCLUSIVE_C14N: &str = "http://www.w3.org/2001/10/xml-exc-c14n#";
pub const EXCLUSIVE_C14N_WITH_COMMENTS: &str = "http://www.w3.org/2001/10/xml-exc-c14n#WithComments";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum C14nMethod {
    Canonical10,
    Canonical10WithComments,
    #[default]
    Exclusive,
    ExclusiveWithComments,
}

impl C14nMethod {
    pub fn from_uri(uri: &str) -> Option<Self> {
        match uri {
            C14N_10 => Some(Self::Canonical10),
            C14N_10_WITH_COMMENTS => Some(Self::Canonical10WithComments),
            EXCLUSIVE_C14N => Some(Self::Exclusive),
            EXCLUSIVE_C14N_WITH_COMMENTS => Some(Self::ExclusiveWithComments),
            _ => None,
        }
    }

    pub fn uri(self) -> &'static str {
        match self {
            Self::Canonical10 => C14N_10,
            Self::Canonical10WithComments => C14N_10_WITH_COMMENTS,
            Self::Exclusive => EXCLUSIVE_C14N,
            Self::ExclusiveWithComments => EXCLUSIVE_C14N_WITH_COMMENTS,
        }
    }

    pub fn is_exclusive(self) -> bool {
        matches!(self, Self::Exclusive | Self::ExclusiveWithComments)
    }

    pub fn with_comments(self) -> bool {
        matches!(self, Self::Canonical10WithComments | Self::ExclusiveWithComments)
    }

    /// The same method with comments removed
    pub fn without_comments(self) -> Self {
        match self {
            Self::Canonical10 | Self::Canonical10WithComments => Self::Canonical10,
            Self::Exclusive | Self::ExclusiveWithComments => Self::Exclusive,
        }
    }
}

/// Canonicalize `element` and its descendants.
///
/// `inherited` is the namespace scope in effect at the element's parent and
/// `inherited_xml` the `xml:*` attributes of its ancestors, nearest first
/// wins. The inclusive methods render those on the apex unless the apex
/// sets them itself. `inclusive_prefixes` is the exclusive c14n `PrefixList`, where
/// `#default` names the default namespace; it is ignored by the inclusive
/// methods.
pub fn canonicalize(
    element: &Element,
    inherited: &NamespaceScope,
    inherited_xml: &[Attribute],
    method: C14nMethod,
    inclusive_prefixes: &[String],
) -> Result<String> {
    let inclusive_prefixes = inclusive_prefixes
        .iter()
        .map(|prefix| {
            if prefix == "#default" {
                String::new()
            } else {
                prefix.clone()
            }
        })
        .collect();

    let apex_xml_attributes = if method.is_exclusive() {
        Vec::new()
    } else {
        inherited_xml
            .iter()
            .filter(|attr| attr.prefix() == Some("xml") && element.attribute(&attr.name).is_none())
            .cloned()
            .collect()
    };

    let mut canonicalizer = Canonicalizer {
        method,
        inclusive_prefixes,
        apex_xml_attributes,
        out: String::new(),
    };
    canonicalizer.render_element(element, inherited, &BTreeMap::new());
    Ok(canonicalizer.out)
}

struct Canonicalizer {
    method: C14nMethod,
    inclusive_prefixes: BTreeSet<String>,
    /// Consumed by the first (apex) element rendered
    apex_xml_attributes: Vec<Attribute>,
    out: String,
}

impl Canonicalizer {
    fn render_element(
        &mut self,
        element: &Element,
        parent_scope: &NamespaceScope,
        rendered: &BTreeMap<String, String>,
    ) {
        let scope = parent_scope.enter(element);

        let render_ns = if self.method.is_exclusive() {
            self.exclusive_namespaces(element, &scope, rendered)
        } else {
            inclusive_namespaces(&scope, rendered)
        };

        self.out.push('<');
        self.out.push_str(&element.name);

        // Namespace declarations sorted by prefix, default namespace first
        for (prefix, uri) in &render_ns {
            if prefix.is_empty() {
                self.out.push_str(" xmlns=\"");
            } else {
                self.out.push_str(" xmlns:");
                self.out.push_str(prefix);
                self.out.push_str("=\"");
            }
            self.out.push_str(&escape_attr_value(uri));
            self.out.push('"');
        }

        // Attributes sorted by namespace URI, then local name
        let inherited_xml = std::mem::take(&mut self.apex_xml_attributes);
        let mut attributes: Vec<(&str, &str, &str, &str)> = element
            .regular_attributes()
            .chain(inherited_xml.iter())
            .map(|attr| {
                let (prefix, local) = split_qname(&attr.name);
                let uri = match prefix {
                    Some(_) => scope.resolve(prefix).unwrap_or_default(),
                    None => "",
                };
                (uri, local, attr.name.as_str(), attr.value.as_str())
            })
            .collect();
        attributes.sort_by(|a, b| (a.0, a.1).cmp(&(b.0, b.1)));

        for (_, _, name, value) in attributes {
            self.out.push(' ');
            self.out.push_str(name);
            self.out.push_str("=\"");
            self.out.push_str(&escape_attr_value(value));
            self.out.push('"');
        }
        self.out.push('>');

        let mut child_rendered = rendered.clone();
        for (prefix, uri) in render_ns {
            if uri.is_empty() {
                child_rendered.remove(&prefix);
            } else {
                child_rendered.insert(prefix, uri);
            }
        }

        for child in &element.children {
            match child {
                Node::Element(child) => self.render_element(child, &scope, &child_rendered),
                Node::Text(text) | Node::CData(text) => {
                    self.out.push_str(&escape_text_value(text));
                }
                Node::Comment(text) => {
                    if self.method.with_comments() {
                        self.out.push_str("<!--");
                        self.out.push_str(text);
                        self.out.push_str("-->");
                    }
                }
                Node::ProcessingInstruction { target, content } => {
                    self.out.push_str("<?");
                    self.out.push_str(target);
                    if !content.is_empty() {
                        self.out.push(' ');
                        self.out.push_str(content);
                    }
                    self.out.push_str("?>");
                }
            }
        }

        self.out.push_str("</");
        self.out.push_str(&element.name);
        self.out.push('>');
    }

    /// Namespaces visibly utilized by the element (or listed in the
    /// PrefixList) that no output ancestor has rendered with the same URI.
    fn exclusive_namespaces(
        &self,
        element: &Element,
        scope: &NamespaceScope,
        rendered: &BTreeMap<String, String>,
    ) -> Vec<(String, String)> {
        let mut utilized = BTreeSet::new();
        utilized.insert(element.prefix().unwrap_or_default().to_string());
        for attr in element.regular_attributes() {
            if let Some(prefix) = attr.prefix() {
                // xml: is implicitly bound and never rendered
                if prefix != "xml" {
                    utilized.insert(prefix.to_string());
                }
            }
        }
        for prefix in &self.inclusive_prefixes {
            if scope.get(prefix).is_some() {
                utilized.insert(prefix.clone());
            }
        }

        let mut render = Vec::new();
        for prefix in utilized {
            if prefix == "xml" {
                continue;
            }
            match scope.get(&prefix) {
                Some(uri) if rendered.get(&prefix).map(String::as_str) != Some(uri) => {
                    render.push((prefix, uri.to_string()));
                }
                Some(_) => {}
                // An unqualified element in no namespace below a rendered
                // default namespace needs xmlns=""
                None if prefix.is_empty() && rendered.contains_key("") => {
                    render.push((prefix, String::new()));
                }
                None => {}
            }
        }
        render
    }
}

/// Every in-scope namespace whose binding differs from what the output
/// ancestors rendered. At the apex this is the whole scope.
fn inclusive_namespaces(
    scope: &NamespaceScope,
    rendered: &BTreeMap<String, String>,
) -> Vec<(String, String)> {
    let mut render: Vec<(String, String)> = scope
        .bindings()
        .filter(|(prefix, _)| *prefix != "xml")
        .filter(|(prefix, uri)| rendered.get(*prefix).map(String::as_str) != Some(*uri))
        .map(|(prefix, uri)| (prefix.to_string(), uri.to_string()))
        .collect();

    if scope.get("").is_none() && rendered.contains_key("") {
        render.insert(0, (String::new(), String::new()));
    }
    render
}

/// Escape attribute value per C14N rules.
fn escape_attr_value(value: &str) -> String {
    let mut out = String::with_capacity(value.len() + value.len() / 4);
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

/// Escape text node value per C14N rules.
fn escape_text_value(text: &str) -> String {
    let mut out = String::with_capacity(text.len() + text.len() / 4);
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

#[cfg(test)]
mod tests {
    use super::*;
    use crate::xml::{NodePath, XmlDocument};

    fn exclusive(xml: &str) -> String {
        let doc = XmlDocument::parse(xml).unwrap();
        canonicalize(doc.root(), &NamespaceScope::new(), &[], C14nMethod::Exclusive, &[]).unwrap()
    }

    fn subtree(xml: &str, path: &[usize], method: C14nMethod, prefixes: &[String]) -> String {
        let doc = XmlDocument::parse(xml).unwrap();
        doc.canonicalize(&NodePath::from_indices(path), method, prefixes)
            .unwrap()
    }

    #[test]
    fn test_basic_canonicalization() {
        let result = exclusive(r#"<root><child attr="value">text</child></root>"#);
        assert_eq!(result, r#"<root><child attr="value">text</child></root>"#);
    }

    #[test]
    fn test_empty_elements_are_expanded() {
        assert_eq!(exclusive("<a><b/></a>"), "<a><b></b></a>");
    }

    #[test]
    fn test_attribute_escaping() {
        let result = exclusive(r#"<root attr="&lt;&quot;&#x9;&#xA;&#xD;>">a &gt; b</root>"#);
        assert_eq!(result, r#"<root attr="&lt;&quot;&#x9;&#xA;&#xD;>">a &gt; b</root>"#);
    }

    #[test]
    fn test_attribute_order() {
        let result = exclusive(r#"<a xmlns:z="urn:a" xmlns:b="urn:z" z:x="1" b:y="2" c="3" b="4"/>"#);
        assert_eq!(
            result,
            r#"<a xmlns:b="urn:z" xmlns:z="urn:a" b="4" c="3" z:x="1" b:y="2"></a>"#
        );
    }

    #[test]
    fn test_namespace_not_duplicated() {
        let result = exclusive(r#"<root xmlns="http://example.com"><child>text</child></root>"#);
        assert_eq!(result.matches(r#"xmlns="http://example.com""#).count(), 1);
    }

    #[test]
    fn test_unused_prefix_dropped_in_exclusive_mode() {
        let result = exclusive(r#"<root xmlns:a="http://a.com"><child>text</child></root>"#);
        assert_eq!(result, "<root><child>text</child></root>");
    }

    #[test]
    fn test_prefix_utilized_by_element() {
        let result = exclusive(r#"<root xmlns:a="http://a.com"><a:child>text</a:child></root>"#);
        assert!(result.contains(r#"<a:child xmlns:a="http://a.com">"#));
    }

    #[test]
    fn test_prefix_utilized_by_attribute() {
        let result = exclusive(r#"<root xmlns:a="http://a.com"><child a:attr="value">text</child></root>"#);
        assert!(result.contains(r#"<child xmlns:a="http://a.com" a:attr="value">"#));
    }

    #[test]
    fn test_inclusive_namespaces_prefix_list() {
        let xml = r#"<root xmlns:a="http://a.com" xmlns:b="http://b.com"><child>text</child></root>"#;
        let result = subtree(xml, &[0], C14nMethod::Exclusive, &["a".to_string()]);
        assert_eq!(result, r#"<child xmlns:a="http://a.com">text</child>"#);
    }

    #[test]
    fn test_subtree_inherits_ancestor_namespace() {
        let xml = r#"<samlp:Response xmlns:samlp="urn:p" xmlns:saml="urn:a"><saml:Issuer>idp</saml:Issuer></samlp:Response>"#;
        let result = subtree(xml, &[0], C14nMethod::Exclusive, &[]);
        assert_eq!(result, r#"<saml:Issuer xmlns:saml="urn:a">idp</saml:Issuer>"#);
    }

    #[test]
    fn test_inclusive_mode_renders_whole_scope_at_apex() {
        let xml = r#"<root xmlns:a="http://a.com" xmlns="urn:d"><child><inner/></child></root>"#;
        let result = subtree(xml, &[0], C14nMethod::Canonical10, &[]);
        assert_eq!(
            result,
            r#"<child xmlns="urn:d" xmlns:a="http://a.com"><inner></inner></child>"#
        );
    }

    #[test]
    fn test_inclusive_apex_inherits_xml_attributes() {
        let xml = r#"<a xml:lang="en"><b/></a>"#;
        assert_eq!(
            subtree(xml, &[0], C14nMethod::Canonical10, &[]),
            r#"<b xml:lang="en"></b>"#
        );
        assert_eq!(subtree(xml, &[0], C14nMethod::Exclusive, &[]), "<b></b>");
    }

    #[test]
    fn test_nearest_xml_attribute_wins_and_apex_overrides() {
        let xml = r#"<a xml:lang="en" xml:space="preserve"><m xml:lang="de"><b c="1"/><d xml:lang="fr"/></m></a>"#;
        assert_eq!(
            subtree(xml, &[0, 0], C14nMethod::Canonical10, &[]),
            r#"<b c="1" xml:lang="de" xml:space="preserve"></b>"#
        );
        assert_eq!(
            subtree(xml, &[0, 1], C14nMethod::Canonical10WithComments, &[]),
            r#"<d xml:lang="fr" xml:space="preserve"></d>"#
        );
    }

    #[test]
    fn test_xml_attributes_only_on_apex() {
        let xml = r#"<a xml:lang="en"><b><c/></b></a>"#;
        assert_eq!(
            subtree(xml, &[0], C14nMethod::Canonical10, &[]),
            r#"<b xml:lang="en"><c></c></b>"#
        );
    }

    #[test]
    fn test_without_comments() {
        assert_eq!(
            C14nMethod::Canonical10WithComments.without_comments(),
            C14nMethod::Canonical10
        );
        assert_eq!(
            C14nMethod::ExclusiveWithComments.without_comments(),
            C14nMethod::Exclusive
        );
        assert_eq!(C14nMethod::Exclusive.without_comments(), C14nMethod::Exclusive);
    }

    #[test]
    fn test_default_namespace_undeclared() {
        let result = exclusive(r#"<a xmlns="urn:d"><b xmlns=""/></a>"#);
        assert_eq!(result, r#"<a xmlns="urn:d"><b xmlns=""></b></a>"#);
    }

    #[test]
    fn test_comments_only_with_comments_method() {
        let doc = XmlDocument::parse("<a><!--c--><?pi x?>t</a>").unwrap();
        let scope = NamespaceScope::new();
        let without = canonicalize(doc.root(), &scope, &[], C14nMethod::Exclusive, &[]).unwrap();
        let with =
            canonicalize(doc.root(), &scope, &[], C14nMethod::ExclusiveWithComments, &[]).unwrap();
        assert_eq!(without, "<a><?pi x?>t</a>");
        assert_eq!(with, "<a><!--c--><?pi x?>t</a>");
    }

    #[test]
    fn test_cdata_becomes_text() {
        assert_eq!(exclusive("<a><![CDATA[1 < 2]]></a>"), "<a>1 &lt; 2</a>");
    }

    #[test]
    fn test_method_uris_round_trip() {
        for method in [
            C14nMethod::Canonical10,
            C14nMethod::Canonical10WithComments,
            C14nMethod::Exclusive,
            C14nMethod::ExclusiveWithComments,
        ] {
            assert_eq!(C14nMethod::from_uri(method.uri()), Some(method));
        }
        assert_eq!(C14nMethod::from_uri("urn:unknown"), None);
    }
}
