//! Minimal XPath 1.0 subset.
//!
//! Supported: absolute (`/a/b`), descendant (`//a`) and relative (`./a`,
//! `a/b`, `..`) location paths over elements, name tests `p:local`, `local`,
//! `*` and `p:*`, and the predicates `[n]`, `[last()]`, `[@attr]` and
//! `[@attr='value']`. Prefixes in name tests resolve through the caller's
//! bindings; unprefixed names match elements in no namespace.

use std::collections::BTreeMap;

use super::dom::{Element, split_qname};
use super::{Error, NodePath, Result, XmlDocument};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Expression {
    absolute: bool,
    steps: Vec<Step>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct Step {
    descendant: bool,
    test: NodeTest,
    predicates: Vec<Predicate>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum NodeTest {
    SelfNode,
    Parent,
    Name {
        prefix: Option<String>,
        local: Option<String>,
    },
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Predicate {
    Position(usize),
    Last,
    HasAttribute(String),
    AttributeEquals(String, String),
}

/// `None` stands for the document node
type Context = Option<NodePath>;

impl Expression {
    pub fn parse(expr: &str) -> Result<Self> {
        let mut rest = expr.trim();
        if rest.is_empty() {
            return Err(Error::XPath("empty expression".into()));
        }

        let absolute = rest.starts_with('/');
        let mut descendant = false;
        if let Some(stripped) = rest.strip_prefix("//") {
            descendant = true;
            rest = stripped;
        } else if let Some(stripped) = rest.strip_prefix('/') {
            rest = stripped;
        }

        let mut steps = Vec::new();
        loop {
            let (step, remainder) = split_step(rest)?;
            steps.push(parse_step(step, descendant)?);
            if remainder.is_empty() {
                break;
            }
            if let Some(stripped) = remainder.strip_prefix("//") {
                descendant = true;
                rest = stripped;
            } else {
                descendant = false;
                rest = &remainder[1..];
            }
            if rest.is_empty() {
                return Err(Error::XPath(format!("trailing '/' in {expr}")));
            }
        }

        Ok(Self { absolute, steps })
    }

    /// Evaluate the expression. Relative expressions start at `context`, or
    /// at the document node when no context is given. Results are element
    /// paths in document order without duplicates.
    pub fn evaluate(
        &self,
        doc: &XmlDocument,
        context: Option<&NodePath>,
        namespaces: &BTreeMap<String, String>,
    ) -> Result<Vec<NodePath>> {
        let start = if self.absolute { None } else { context.cloned() };
        let mut current: Vec<Context> = vec![start];

        for step in &self.steps {
            let bases = if step.descendant {
                descendants_or_self(doc, &current)
            } else {
                current
            };

            let mut next = Vec::new();
            for base in &bases {
                let candidates = step.candidates(doc, base, namespaces)?;
                next.extend(step.filter(doc, candidates, namespaces)?);
            }
            next.sort();
            next.dedup();
            current = next;
        }

        Ok(current.into_iter().flatten().collect())
    }
}

impl Step {
    fn candidates(
        &self,
        doc: &XmlDocument,
        base: &Context,
        namespaces: &BTreeMap<String, String>,
    ) -> Result<Vec<Context>> {
        match &self.test {
            NodeTest::SelfNode => Ok(vec![base.clone()]),
            NodeTest::Parent => Ok(match base {
                Some(path) if path.is_root() => vec![None],
                Some(path) => vec![path.parent()],
                None => Vec::new(),
            }),
            NodeTest::Name { prefix, local } => {
                let uri = match prefix {
                    Some(prefix) => Some(namespaces.get(prefix).ok_or_else(|| {
                        Error::XPath(format!("unbound namespace prefix '{prefix}'"))
                    })?),
                    None => None,
                };
                let wildcard = prefix.is_none() && local.is_none();

                let mut matched = Vec::new();
                for path in child_elements(doc, base) {
                    let element = doc.element(&path).ok_or_else(|| missing(&path))?;
                    if let Some(local) = local {
                        if element.local_name() != local {
                            continue;
                        }
                    }
                    if !wildcard {
                        let scope = doc.scope_of(&path).ok_or_else(|| missing(&path))?;
                        if scope.element_namespace(element) != uri.map(String::as_str) {
                            continue;
                        }
                    }
                    matched.push(Some(path));
                }
                Ok(matched)
            }
        }
    }

    fn filter(
        &self,
        doc: &XmlDocument,
        mut candidates: Vec<Context>,
        namespaces: &BTreeMap<String, String>,
    ) -> Result<Vec<Context>> {
        for predicate in &self.predicates {
            candidates = match predicate {
                Predicate::Position(position) => candidates
                    .into_iter()
                    .nth(position - 1)
                    .into_iter()
                    .collect(),
                Predicate::Last => candidates.pop().into_iter().collect(),
                Predicate::HasAttribute(name) => {
                    let mut kept = Vec::new();
                    for candidate in candidates {
                        if attribute_value(doc, &candidate, name, namespaces)?.is_some() {
                            kept.push(candidate);
                        }
                    }
                    kept
                }
                Predicate::AttributeEquals(name, value) => {
                    let mut kept = Vec::new();
                    for candidate in candidates {
                        if attribute_value(doc, &candidate, name, namespaces)?.as_deref()
                            == Some(value.as_str())
                        {
                            kept.push(candidate);
                        }
                    }
                    kept
                }
            };
        }
        Ok(candidates)
    }
}

fn missing(path: &NodePath) -> Error {
    Error::NodeNotFound(path.to_string())
}

fn child_elements(doc: &XmlDocument, base: &Context) -> Vec<NodePath> {
    match base {
        None => vec![NodePath::root()],
        Some(path) => doc
            .element(path)
            .map(|element| {
                element
                    .child_elements()
                    .map(|(index, _)| path.child(index))
                    .collect()
            })
            .unwrap_or_default(),
    }
}

/// The `descendant-or-self::node()` axis restricted to elements, plus the
/// document node when it is part of the input.
fn descendants_or_self(doc: &XmlDocument, contexts: &[Context]) -> Vec<Context> {
    let mut result = Vec::new();
    for context in contexts {
        result.push(context.clone());
        let (element, path) = match context {
            None => (doc.root(), NodePath::root()),
            Some(path) => match doc.element(path) {
                Some(element) => (element, path.clone()),
                None => continue,
            },
        };
        if context.is_none() {
            result.push(Some(NodePath::root()));
        }
        collect_descendants(element, &path, &mut result);
    }
    result.sort();
    result.dedup();
    result
}

fn collect_descendants(element: &Element, path: &NodePath, out: &mut Vec<Context>) {
    for (index, child) in element.child_elements() {
        let child_path = path.child(index);
        out.push(Some(child_path.clone()));
        collect_descendants(child, &child_path, out);
    }
}

fn attribute_value(
    doc: &XmlDocument,
    context: &Context,
    name: &str,
    namespaces: &BTreeMap<String, String>,
) -> Result<Option<String>> {
    let Some(path) = context else {
        return Ok(None);
    };
    let element = doc.element(path).ok_or_else(|| missing(path))?;

    let (prefix, local) = split_qname(name);
    let value = match prefix {
        None => element
            .regular_attributes()
            .find(|attr| attr.prefix().is_none() && attr.local_name() == local),
        Some(prefix) => {
            let uri = namespaces
                .get(prefix)
                .ok_or_else(|| Error::XPath(format!("unbound namespace prefix '{prefix}'")))?;
            let scope = doc.scope_of(path).ok_or_else(|| missing(path))?;
            element.regular_attributes().find(|attr| {
                attr.prefix().is_some()
                    && attr.local_name() == local
                    && scope.resolve(attr.prefix()) == Some(uri.as_str())
            })
        }
    };
    Ok(value.map(|attr| attr.value.clone()))
}

/// Split off the first step, honouring brackets and quoted literals
fn split_step(expr: &str) -> Result<(&str, &str)> {
    let mut depth = 0usize;
    let mut quote = None;
    for (index, ch) in expr.char_indices() {
        match (quote, ch) {
            (Some(q), c) if c == q => quote = None,
            (Some(_), _) => {}
            (None, '\'' | '"') => quote = Some(ch),
            (None, '[') => depth += 1,
            (None, ']') => {
                depth = depth
                    .checked_sub(1)
                    .ok_or_else(|| Error::XPath(format!("unbalanced ']' in {expr}")))?;
            }
            (None, '/') if depth == 0 => return Ok((&expr[..index], &expr[index..])),
            _ => {}
        }
    }
    if depth != 0 || quote.is_some() {
        return Err(Error::XPath(format!("unterminated predicate in {expr}")));
    }
    Ok((expr, ""))
}

fn parse_step(step: &str, descendant: bool) -> Result<Step> {
    let (name, mut predicates_text) = match step.find('[') {
        Some(index) => (&step[..index], &step[index..]),
        None => (step, ""),
    };
    let name = name.trim();

    let test = match name {
        "." => NodeTest::SelfNode,
        ".." => NodeTest::Parent,
        "*" => NodeTest::Name {
            prefix: None,
            local: None,
        },
        _ => {
            if name.is_empty()
                || name.contains("::")
                || name.contains(['(', ')', '@', '=', ' '])
            {
                return Err(Error::XPath(format!("unsupported step '{step}'")));
            }
            let (prefix, local) = split_qname(name);
            NodeTest::Name {
                prefix: prefix.map(str::to_string),
                local: (local != "*").then(|| local.to_string()),
            }
        }
    };

    let mut predicates = Vec::new();
    while !predicates_text.is_empty() {
        let inner_end = predicate_end(predicates_text)
            .ok_or_else(|| Error::XPath(format!("unterminated predicate in '{step}'")))?;
        predicates.push(parse_predicate(&predicates_text[1..inner_end])?);
        predicates_text = predicates_text[inner_end + 1..].trim_start();
        if !predicates_text.is_empty() && !predicates_text.starts_with('[') {
            return Err(Error::XPath(format!("unexpected '{predicates_text}' in '{step}'")));
        }
    }

    if matches!(test, NodeTest::SelfNode | NodeTest::Parent) && !predicates.is_empty() {
        return Err(Error::XPath(format!("predicates are not supported on '{name}'")));
    }

    Ok(Step {
        descendant,
        test,
        predicates,
    })
}

/// Index of the `]` closing the predicate that starts at index 0
fn predicate_end(text: &str) -> Option<usize> {
    let mut quote = None;
    for (index, ch) in text.char_indices().skip(1) {
        match (quote, ch) {
            (Some(q), c) if c == q => quote = None,
            (Some(_), _) => {}
            (None, '\'' | '"') => quote = Some(ch),
            (None, ']') => return Some(index),
            _ => {}
        }
    }
    None
}

fn parse_predicate(inner: &str) -> Result<Predicate> {
    let inner = inner.trim();
    if inner == "last()" {
        return Ok(Predicate::Last);
    }
    if let Ok(position) = inner.parse::<usize>() {
        if position == 0 {
            return Err(Error::XPath("positions start at 1".into()));
        }
        return Ok(Predicate::Position(position));
    }

    let attribute = inner
        .strip_prefix('@')
        .ok_or_else(|| Error::XPath(format!("unsupported predicate '[{inner}]'")))?;
    match attribute.split_once('=') {
        None => Ok(Predicate::HasAttribute(attribute.trim().to_string())),
        Some((name, literal)) => {
            let literal = literal.trim();
            let value = literal
                .strip_prefix('\'')
                .and_then(|v| v.strip_suffix('\''))
                .or_else(|| literal.strip_prefix('"').and_then(|v| v.strip_suffix('"')))
                .ok_or_else(|| Error::XPath(format!("expected a quoted literal in '[{inner}]'")))?;
            Ok(Predicate::AttributeEquals(
                name.trim().to_string(),
                value.to_string(),
            ))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMLP: &str = "urn:oasis:names:tc:SAML:2.0:protocol";
    const SAML: &str = "urn:oasis:names:tc:SAML:2.0:assertion";

    fn bindings() -> BTreeMap<String, String> {
        BTreeMap::from([
            ("samlp".to_string(), SAMLP.to_string()),
            ("saml".to_string(), SAML.to_string()),
        ])
    }

    fn response() -> XmlDocument {
        XmlDocument::parse(format!(
            r#"<samlp:Response xmlns:samlp="{SAMLP}" xmlns:saml="{SAML}" ID="_r"><saml:Issuer>idp</saml:Issuer><samlp:Status/><saml:Assertion ID="_a1"><saml:Issuer>idp</saml:Issuer></saml:Assertion><saml:Assertion ID="_a2"/><Plain/></samlp:Response>"#
        ))
        .unwrap()
    }

    fn select(doc: &XmlDocument, expr: &str) -> Vec<NodePath> {
        Expression::parse(expr)
            .unwrap()
            .evaluate(doc, None, &bindings())
            .unwrap()
    }

    #[test]
    fn test_absolute_path() {
        let doc = response();
        assert_eq!(select(&doc, "/samlp:Response/saml:Issuer"), vec![NodePath::from_indices([0])]);
        assert_eq!(select(&doc, "/samlp:Response"), vec![NodePath::root()]);
    }

    #[test]
    fn test_descendant_path_in_document_order() {
        let doc = response();
        assert_eq!(
            select(&doc, "//saml:Issuer"),
            vec![NodePath::from_indices([0]), NodePath::from_indices([2, 0])]
        );
    }

    #[test]
    fn test_wildcards() {
        let doc = response();
        assert_eq!(select(&doc, "/*").len(), 1);
        assert_eq!(select(&doc, "/*/saml:*").len(), 3);
        assert_eq!(select(&doc, "/*/*").len(), 5);
    }

    #[test]
    fn test_unprefixed_name_matches_no_namespace_only() {
        let doc = response();
        assert_eq!(select(&doc, "/*/Plain"), vec![NodePath::from_indices([4])]);
        assert!(select(&doc, "/*/Issuer").is_empty());
    }

    #[test]
    fn test_predicates() {
        let doc = response();
        assert_eq!(select(&doc, "/*/saml:Assertion[2]"), vec![NodePath::from_indices([3])]);
        assert_eq!(select(&doc, "/*/saml:Assertion[last()]"), vec![NodePath::from_indices([3])]);
        assert_eq!(select(&doc, "//*[@ID='_a1']"), vec![NodePath::from_indices([2])]);
        assert_eq!(select(&doc, "//*[@ID]").len(), 3);
        assert!(select(&doc, "//*[@ID=\"missing\"]").is_empty());
    }

    #[test]
    fn test_relative_path_from_context() {
        let doc = response();
        let assertion = NodePath::from_indices([2]);
        let found = Expression::parse("./saml:Issuer")
            .unwrap()
            .evaluate(&doc, Some(&assertion), &bindings())
            .unwrap();
        assert_eq!(found, vec![NodePath::from_indices([2, 0])]);

        let parent = Expression::parse("..")
            .unwrap()
            .evaluate(&doc, Some(&assertion), &bindings())
            .unwrap();
        assert_eq!(parent, vec![NodePath::root()]);
    }

    #[test]
    fn test_unbound_prefix_is_an_error() {
        let doc = response();
        let result = Expression::parse("/md:EntityDescriptor")
            .unwrap()
            .evaluate(&doc, None, &bindings());
        assert!(matches!(result, Err(Error::XPath(_))));
    }

    #[test]
    fn test_unsupported_syntax() {
        assert!(Expression::parse("").is_err());
        assert!(Expression::parse("/a/").is_err());
        assert!(Expression::parse("/child::a").is_err());
        assert!(Expression::parse("/a[contains(@ID,'x')]").is_err());
        assert!(Expression::parse("/a[0]").is_err());
        assert!(Expression::parse("/a[@ID='x'").is_err());
    }
}
