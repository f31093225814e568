//! Owned XML document model used for signing and verification.
//!
//! Documents are parsed with quick-xml into a small tree that keeps
//! namespace declarations as written, so that serialization and
//! canonicalization see exactly what the producer wrote.

mod c14n;
mod doctype;
mod dom;
mod error;
mod namespace;
mod parser;
mod writer;
pub mod xpath;

use std::collections::BTreeMap;

use crate::saml::namespaces::SIGNATURE;

pub use c14n::{
    C14N_10, C14N_10_WITH_COMMENTS, C14nMethod, EXCLUSIVE_C14N, EXCLUSIVE_C14N_WITH_COMMENTS,
    canonicalize,
};
pub use doctype::{Doctype, IdDeclaration};
pub use dom::{Attribute, Element, Node, NodePath};
pub use error::Error;
pub use namespace::NamespaceScope;
pub use xpath::Expression;

pub type Result<T> = std::result::Result<T, Error>;

pub const XML_NAMESPACE: &str = "http://www.w3.org/XML/1998/namespace";

/// Attribute treated as an ID when the document carries no DOCTYPE
pub const DEFAULT_ID_ATTRIBUTE: &str = "ID";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct XmlDocument {
    doctype: Option<Doctype>,
    root: Element,
}

impl XmlDocument {
    pub fn parse(xml: impl AsRef<str>) -> Result<Self> {
        parser::parse_document(xml.as_ref())
    }

    pub fn from_root(root: Element) -> Self {
        Self {
            doctype: None,
            root,
        }
    }

    pub fn root(&self) -> &Element {
        &self.root
    }

    pub fn root_mut(&mut self) -> &mut Element {
        &mut self.root
    }

    pub fn into_root(self) -> Element {
        self.root
    }

    pub fn doctype(&self) -> Option<&Doctype> {
        self.doctype.as_ref()
    }

    /// Serialize the document: DOCTYPE if any, then the root element. No XML
    /// declaration is written and there is no surrounding whitespace.
    pub fn to_xml(&self) -> String {
        writer::write_document(self)
    }

    pub fn element(&self, path: &NodePath) -> Option<&Element> {
        if path.is_root() {
            return Some(&self.root);
        }
        self.root.descendant(path.indices())?.as_element()
    }

    pub fn element_mut(&mut self, path: &NodePath) -> Option<&mut Element> {
        if path.is_root() {
            return Some(&mut self.root);
        }
        self.root.descendant_mut(path.indices())?.as_element_mut()
    }

    /// Namespace scope in effect inside the element at `path`, including
    /// the element's own declarations.
    pub fn scope_of(&self, path: &NodePath) -> Option<NamespaceScope> {
        let mut scope = NamespaceScope::new().enter(&self.root);
        let mut element = &self.root;
        for index in path.indices() {
            element = element.children.get(*index)?.as_element()?;
            scope = scope.enter(element);
        }
        Some(scope)
    }

    /// Namespace scope in effect at the parent of the element at `path`
    pub fn parent_scope_of(&self, path: &NodePath) -> Option<NamespaceScope> {
        match path.parent() {
            Some(parent) => self.scope_of(&parent),
            None => Some(NamespaceScope::new()),
        }
    }

    /// All elements in document order
    pub fn elements(&self) -> Vec<(NodePath, &Element)> {
        let mut found = vec![(NodePath::root(), &self.root)];
        collect_elements(&self.root, &NodePath::root(), &mut found);
        found
    }

    pub fn select(&self, expr: &str, namespaces: &BTreeMap<String, String>) -> Result<Vec<NodePath>> {
        Expression::parse(expr)?.evaluate(self, None, namespaces)
    }

    pub fn select_from(
        &self,
        context: &NodePath,
        expr: &str,
        namespaces: &BTreeMap<String, String>,
    ) -> Result<Vec<NodePath>> {
        Expression::parse(expr)?.evaluate(self, Some(context), namespaces)
    }

    /// Names of the attributes acting as IDs on `element`. With a DOCTYPE
    /// only the `ID` typed attributes it declares for the element name
    /// count; without one the SAML `ID` attribute does.
    pub fn id_attributes_of<'a>(&'a self, element: &'a Element) -> Vec<&'a str> {
        match &self.doctype {
            Some(doctype) => doctype.id_attributes_for(&element.name).collect(),
            None => vec![DEFAULT_ID_ATTRIBUTE],
        }
    }

    /// Elements carrying `id` as an ID, in document order
    pub fn elements_with_id(&self, id: &str) -> Vec<NodePath> {
        self.elements()
            .into_iter()
            .filter(|(_, element)| {
                self.id_attributes_of(element)
                    .into_iter()
                    .any(|name| element.attribute(name) == Some(id))
            })
            .map(|(path, _)| path)
            .collect()
    }

    /// First `Signature` element of the XML-DSig namespace in document order
    pub fn signature_path(&self) -> Option<NodePath> {
        find_signature(&self.root, &NamespaceScope::new(), NodePath::root())
    }

    pub fn is_signed(&self) -> bool {
        self.signature_path().is_some()
    }

    /// Canonical form of the subtree rooted at `path`
    pub fn canonicalize(
        &self,
        path: &NodePath,
        method: C14nMethod,
        inclusive_prefixes: &[String],
    ) -> Result<String> {
        let element = self.element(path).ok_or_else(|| not_found(path))?;
        let scope = self.parent_scope_of(path).ok_or_else(|| not_found(path))?;
        let inherited_xml = self.inherited_xml_attributes(path);
        canonicalize(element, &scope, &inherited_xml, method, inclusive_prefixes)
    }

    /// `xml:*` attributes set on the ancestors of the element at `path`, the
    /// nearest ancestor's value winning
    pub fn inherited_xml_attributes(&self, path: &NodePath) -> Vec<Attribute> {
        let mut found = BTreeMap::new();
        let Some(parent) = path.parent() else {
            return Vec::new();
        };
        let mut element = &self.root;
        let mut ancestors = vec![element];
        for index in parent.indices() {
            match element.children.get(*index).and_then(Node::as_element) {
                Some(child) => {
                    element = child;
                    ancestors.push(element);
                }
                None => return Vec::new(),
            }
        }
        for ancestor in ancestors {
            for attr in ancestor.regular_attributes() {
                if attr.prefix() == Some("xml") {
                    found.insert(attr.name.clone(), attr.value.clone());
                }
            }
        }
        found
            .into_iter()
            .map(|(name, value)| Attribute::new(name, value))
            .collect()
    }

    /// Detach the node at `path`. The root element cannot be removed.
    pub fn remove_node(&mut self, path: &NodePath) -> Result<Node> {
        let (parent, index) = self.split_path(path)?;
        let parent = self.element_mut(&parent).ok_or_else(|| not_found(path))?;
        if index >= parent.children.len() {
            return Err(not_found(path));
        }
        Ok(parent.children.remove(index))
    }

    /// Insert `node` as the next sibling of the node at `anchor` and return
    /// its path.
    pub fn insert_after(&mut self, anchor: &NodePath, node: Node) -> Result<NodePath> {
        let (parent_path, index) = self.split_path(anchor)?;
        let parent = self.element_mut(&parent_path).ok_or_else(|| not_found(anchor))?;
        if index >= parent.children.len() {
            return Err(not_found(anchor));
        }
        parent.children.insert(index + 1, node);
        Ok(parent_path.child(index + 1))
    }

    /// Move the node at `from` so that it becomes the next sibling of the
    /// node at `anchor`, adjusting for the index shift caused by removal.
    pub fn move_after(&mut self, from: &NodePath, anchor: &NodePath) -> Result<NodePath> {
        if from == anchor || from.is_ancestor_of(anchor) {
            return Err(Error::Malformed(format!(
                "cannot move {from} next to a node inside itself"
            )));
        }
        self.split_path(anchor)?;

        let node = self.remove_node(from)?;

        let mut adjusted = anchor.indices().to_vec();
        let depth = from.indices().len() - 1;
        if adjusted.len() > depth
            && adjusted[..depth] == from.indices()[..depth]
            && adjusted[depth] > from.indices()[depth]
        {
            adjusted[depth] -= 1;
        }
        self.insert_after(&NodePath::from_indices(adjusted), node)
    }

    fn split_path(&self, path: &NodePath) -> Result<(NodePath, usize)> {
        match (path.parent(), path.last_index()) {
            (Some(parent), Some(index)) => Ok((parent, index)),
            _ => Err(Error::Malformed(
                "the root element has no parent to operate on".into(),
            )),
        }
    }
}

fn collect_elements<'a>(element: &'a Element, path: &NodePath, found: &mut Vec<(NodePath, &'a Element)>) {
    for (index, child) in element.child_elements() {
        let child_path = path.child(index);
        found.push((child_path.clone(), child));
        collect_elements(child, &child_path, found);
    }
}

fn find_signature(element: &Element, parent: &NamespaceScope, path: NodePath) -> Option<NodePath> {
    let scope = parent.enter(element);
    if element.local_name() == "Signature" && scope.element_namespace(element) == Some(SIGNATURE) {
        return Some(path);
    }
    element
        .child_elements()
        .find_map(|(index, child)| find_signature(child, &scope, path.child(index)))
}

fn not_found(path: &NodePath) -> Error {
    Error::NodeNotFound(path.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    const DOC: &str = r#"<r ID="_r"><a ID="_a"><x/></a><b ID="_b"/><c/></r>"#;

    #[test]
    fn test_elements_in_document_order() {
        let doc = XmlDocument::parse(DOC).unwrap();
        let names: Vec<_> = doc.elements().into_iter().map(|(_, e)| e.name.as_str()).collect();
        assert_eq!(names, ["r", "a", "x", "b", "c"]);
    }

    #[test]
    fn test_id_lookup_without_doctype_uses_id_attribute() {
        let doc = XmlDocument::parse(DOC).unwrap();
        assert_eq!(doc.elements_with_id("_b"), vec![NodePath::from_indices([1])]);
        assert!(doc.elements_with_id("_missing").is_empty());
    }

    #[test]
    fn test_id_lookup_with_doctype_uses_declared_attributes() {
        let doc = XmlDocument::parse(
            r#"<!DOCTYPE r [ <!ATTLIST r ID ID #IMPLIED> ]><r ID="_r"><a ID="_a"/></r>"#,
        )
        .unwrap();
        assert_eq!(doc.elements_with_id("_r"), vec![NodePath::root()]);
        // <a> has no ID declaration in the DTD
        assert!(doc.elements_with_id("_a").is_empty());
    }

    #[test]
    fn test_id_lookup_with_wrong_doctype_name() {
        let doc = XmlDocument::parse(
            r#"<!DOCTYPE Response [ <!ATTLIST Response ID ID #IMPLIED> ]><p:Response xmlns:p="urn:p" ID="_r"/>"#,
        )
        .unwrap();
        assert!(doc.elements_with_id("_r").is_empty());
    }

    #[test]
    fn test_move_after_later_sibling() {
        let mut doc = XmlDocument::parse(DOC).unwrap();
        let moved = doc
            .move_after(&NodePath::from_indices([0]), &NodePath::from_indices([1]))
            .unwrap();
        assert_eq!(moved, NodePath::from_indices([1]));
        assert_eq!(doc.to_xml(), r#"<r ID="_r"><b ID="_b"/><a ID="_a"><x/></a><c/></r>"#);
    }

    #[test]
    fn test_move_after_into_other_subtree() {
        let mut doc = XmlDocument::parse(DOC).unwrap();
        let moved = doc
            .move_after(&NodePath::from_indices([2]), &NodePath::from_indices([0, 0]))
            .unwrap();
        assert_eq!(moved, NodePath::from_indices([0, 1]));
        assert_eq!(doc.to_xml(), r#"<r ID="_r"><a ID="_a"><x/><c/></a><b ID="_b"/></r>"#);
    }

    #[test]
    fn test_move_rejects_root_and_self_nesting() {
        let mut doc = XmlDocument::parse(DOC).unwrap();
        assert!(doc.move_after(&NodePath::from_indices([0]), &NodePath::root()).is_err());
        assert!(
            doc.move_after(&NodePath::from_indices([0]), &NodePath::from_indices([0, 0]))
                .is_err()
        );
        assert_eq!(doc.to_xml(), DOC);
    }

    #[test]
    fn test_signature_lookup_is_namespace_aware() {
        let doc = XmlDocument::parse(format!(
            r#"<r><Signature/><a><x:Signature xmlns:x="{SIGNATURE}"/></a><ds:Signature xmlns:ds="{SIGNATURE}"/></r>"#
        ))
        .unwrap();
        assert_eq!(doc.signature_path(), Some(NodePath::from_indices([1, 0])));
        assert!(doc.is_signed());

        let unsigned = XmlDocument::parse("<r><Signature/></r>").unwrap();
        assert!(!unsigned.is_signed());
    }

    #[test]
    fn test_scope_of_nested_element() {
        let doc = XmlDocument::parse(r#"<a xmlns:p="urn:p"><b xmlns="urn:d"><c/></b></a>"#).unwrap();
        let scope = doc.scope_of(&NodePath::from_indices([0, 0])).unwrap();
        assert_eq!(scope.get("p"), Some("urn:p"));
        assert_eq!(scope.get(""), Some("urn:d"));
        assert!(doc.scope_of(&NodePath::from_indices([5])).is_none());
    }

    #[test]
    fn test_canonicalize_subtree_carries_inherited_namespace() {
        let doc = XmlDocument::parse(r#"<a xmlns:p="urn:p"><p:b>t</p:b></a>"#).unwrap();
        let c14n = doc
            .canonicalize(&NodePath::from_indices([0]), C14nMethod::Exclusive, &[])
            .unwrap();
        assert_eq!(c14n, r#"<p:b xmlns:p="urn:p">t</p:b>"#);
    }
}
