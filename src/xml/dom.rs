//! Owned XML tree used by the signing and verification workflows.

use std::fmt;

/// A node in the owned XML tree
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Node {
    Element(Element),
    Text(String),
    CData(String),
    Comment(String),
    ProcessingInstruction { target: String, content: String },
}

impl Node {
    pub fn as_element(&self) -> Option<&Element> {
        match self {
            Node::Element(element) => Some(element),
            _ => None,
        }
    }

    pub fn as_element_mut(&mut self) -> Option<&mut Element> {
        match self {
            Node::Element(element) => Some(element),
            _ => None,
        }
    }
}

impl From<Element> for Node {
    fn from(element: Element) -> Self {
        Node::Element(element)
    }
}

/// An attribute as written in the document. Namespace declarations are kept
/// as ordinary attributes (`xmlns`, `xmlns:p`) in document order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Attribute {
    pub name: String,
    pub value: String,
}

impl Attribute {
    pub fn new(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            value: value.into(),
        }
    }

    pub fn prefix(&self) -> Option<&str> {
        split_qname(&self.name).0
    }

    pub fn local_name(&self) -> &str {
        split_qname(&self.name).1
    }

    /// `Some("")` for a default namespace declaration, `Some(prefix)` for a
    /// prefixed one, `None` for a regular attribute.
    pub fn declared_prefix(&self) -> Option<&str> {
        if self.name == "xmlns" {
            Some("")
        } else {
            self.name.strip_prefix("xmlns:")
        }
    }

    pub fn is_namespace_declaration(&self) -> bool {
        self.declared_prefix().is_some()
    }
}

/// An element with its qualified name as written (`ds:Signature`)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Element {
    pub name: String,
    pub attributes: Vec<Attribute>,
    pub children: Vec<Node>,
}

impl Element {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            attributes: Vec::new(),
            children: Vec::new(),
        }
    }

    pub fn prefix(&self) -> Option<&str> {
        split_qname(&self.name).0
    }

    pub fn local_name(&self) -> &str {
        split_qname(&self.name).1
    }

    /// Value of the attribute with the given qualified name
    pub fn attribute(&self, name: &str) -> Option<&str> {
        self.attributes
            .iter()
            .find(|attr| attr.name == name)
            .map(|attr| attr.value.as_str())
    }

    /// Replace the value of an existing attribute or append a new one
    pub fn set_attribute(&mut self, name: impl Into<String>, value: impl Into<String>) {
        let name = name.into();
        let value = value.into();
        match self.attributes.iter_mut().find(|attr| attr.name == name) {
            Some(attr) => attr.value = value,
            None => self.attributes.push(Attribute { name, value }),
        }
    }

    /// Namespace declarations made on this element as `(prefix, uri)`,
    /// the default namespace having the empty prefix.
    pub fn namespace_declarations(&self) -> impl Iterator<Item = (&str, &str)> {
        self.attributes.iter().filter_map(|attr| {
            attr.declared_prefix()
                .map(|prefix| (prefix, attr.value.as_str()))
        })
    }

    /// Attributes that are not namespace declarations
    pub fn regular_attributes(&self) -> impl Iterator<Item = &Attribute> {
        self.attributes
            .iter()
            .filter(|attr| !attr.is_namespace_declaration())
    }

    /// Child elements together with their index in `children`
    pub fn child_elements(&self) -> impl Iterator<Item = (usize, &Element)> {
        self.children
            .iter()
            .enumerate()
            .filter_map(|(index, node)| node.as_element().map(|element| (index, element)))
    }

    pub fn push_child(&mut self, node: impl Into<Node>) {
        self.children.push(node.into());
    }

    /// Concatenated character data of all descendant text and CDATA nodes
    pub fn text(&self) -> String {
        let mut text = String::new();
        collect_text(self, &mut text);
        text
    }

    /// Replace all children by a single text node
    pub fn set_text(&mut self, text: impl Into<String>) {
        self.children = vec![Node::Text(text.into())];
    }

    /// Node reached by following `indices` from this element
    pub fn descendant(&self, indices: &[usize]) -> Option<&Node> {
        let (first, rest) = indices.split_first()?;
        let node = self.children.get(*first)?;
        if rest.is_empty() {
            Some(node)
        } else {
            node.as_element()?.descendant(rest)
        }
    }

    pub fn descendant_mut(&mut self, indices: &[usize]) -> Option<&mut Node> {
        let (first, rest) = indices.split_first()?;
        let node = self.children.get_mut(*first)?;
        if rest.is_empty() {
            Some(node)
        } else {
            node.as_element_mut()?.descendant_mut(rest)
        }
    }
}

fn collect_text(element: &Element, out: &mut String) {
    for child in &element.children {
        match child {
            Node::Text(text) | Node::CData(text) => out.push_str(text),
            Node::Element(element) => collect_text(element, out),
            _ => {}
        }
    }
}

/// Split a qualified name into prefix and local part
pub(crate) fn split_qname(name: &str) -> (Option<&str>, &str) {
    match name.split_once(':') {
        Some((prefix, local)) => (Some(prefix), local),
        None => (None, name),
    }
}

/// Child-index path from the root element to a node. The empty path is the
/// root element itself. Lexicographic order of paths is document order.
#[derive(Debug, Clone, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct NodePath(Vec<usize>);

impl NodePath {
    pub fn root() -> Self {
        Self(Vec::new())
    }

    pub fn from_indices(indices: impl Into<Vec<usize>>) -> Self {
        Self(indices.into())
    }

    pub fn indices(&self) -> &[usize] {
        &self.0
    }

    pub fn is_root(&self) -> bool {
        self.0.is_empty()
    }

    pub fn child(&self, index: usize) -> Self {
        let mut indices = self.0.clone();
        indices.push(index);
        Self(indices)
    }

    pub fn parent(&self) -> Option<Self> {
        let (_, parent) = self.0.split_last()?;
        Some(Self(parent.to_vec()))
    }

    /// Index of this node among its parent's children
    pub fn last_index(&self) -> Option<usize> {
        self.0.last().copied()
    }

    /// True when `self` is a strict ancestor of `other`
    pub fn is_ancestor_of(&self, other: &NodePath) -> bool {
        other.0.len() > self.0.len() && other.0.starts_with(&self.0)
    }

    /// Path of `other` relative to `self`, if `self` is an ancestor-or-self
    pub fn relative(&self, other: &NodePath) -> Option<Vec<usize>> {
        other
            .0
            .strip_prefix(self.0.as_slice())
            .map(|rest| rest.to_vec())
    }
}

impl fmt::Display for NodePath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "/*")?;
        for index in &self.0 {
            write!(f, "/node()[{}]", index + 1)?;
        }
        Ok(())
    }
}
