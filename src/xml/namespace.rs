use std::collections::BTreeMap;

use super::XML_NAMESPACE;
use super::dom::Element;

/// In-scope namespace bindings. The default namespace is stored under the
/// empty prefix.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NamespaceScope {
    bindings: BTreeMap<String, String>,
}

impl NamespaceScope {
    pub fn new() -> Self {
        Self::default()
    }

    /// Scope in effect inside `element`, i.e. this scope with the element's
    /// own declarations applied. An empty URI undeclares the prefix.
    pub fn enter(&self, element: &Element) -> Self {
        let mut scope = self.clone();
        for (prefix, uri) in element.namespace_declarations() {
            if uri.is_empty() {
                scope.bindings.remove(prefix);
            } else {
                scope.bindings.insert(prefix.to_string(), uri.to_string());
            }
        }
        scope
    }

    /// URI bound to `prefix`; `None` resolves the default namespace
    pub fn resolve(&self, prefix: Option<&str>) -> Option<&str> {
        match prefix {
            Some("xml") => Some(XML_NAMESPACE),
            Some(prefix) => self.get(prefix),
            None => self.get(""),
        }
    }

    /// Namespace URI of `element`, which must be the element this scope was
    /// entered for.
    pub fn element_namespace(&self, element: &Element) -> Option<&str> {
        self.resolve(element.prefix())
    }

    pub fn get(&self, prefix: &str) -> Option<&str> {
        self.bindings.get(prefix).map(String::as_str)
    }

    pub fn bindings(&self) -> impl Iterator<Item = (&str, &str)> {
        self.bindings
            .iter()
            .map(|(prefix, uri)| (prefix.as_str(), uri.as_str()))
    }
}
