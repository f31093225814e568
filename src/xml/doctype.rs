//! Document type declarations.
//!
//! Only the internal subset is supported, and only `<!ATTLIST>` declarations
//! are interpreted: they tell which attributes are of type `ID`. External
//! DTDs are rejected since nothing must be fetched while parsing.

use super::{Error, Result};

/// An attribute declared with type `ID` for a given element name
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IdDeclaration {
    pub element: String,
    pub attribute: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Doctype {
    name: String,
    internal_subset: Option<String>,
    id_attributes: Vec<IdDeclaration>,
}

impl Doctype {
    /// Parse the content of a `<!DOCTYPE ...>` declaration, without the
    /// `<!DOCTYPE` keyword and the closing `>`.
    pub fn parse(content: &str) -> Result<Self> {
        let content = content.trim();
        let name_end = content
            .find(|c: char| c.is_whitespace() || c == '[')
            .unwrap_or(content.len());
        let name = &content[..name_end];
        if name.is_empty() {
            return Err(Error::Doctype("missing document type name".into()));
        }

        let rest = content[name_end..].trim_start();
        if rest.starts_with("SYSTEM") || rest.starts_with("PUBLIC") {
            return Err(Error::Doctype(format!(
                "external DTD for '{name}' is not supported"
            )));
        }

        let internal_subset = match rest.strip_prefix('[') {
            Some(subset) => {
                let end = subset
                    .rfind(']')
                    .ok_or_else(|| Error::Doctype("unterminated internal subset".into()))?;
                if !subset[end + 1..].trim().is_empty() {
                    return Err(Error::Doctype("unexpected content after internal subset".into()));
                }
                Some(subset[..end].trim().to_string())
            }
            None if rest.is_empty() => None,
            None => return Err(Error::Doctype(format!("unexpected content: {rest}"))),
        };

        let id_attributes = match &internal_subset {
            Some(subset) => parse_id_declarations(subset)?,
            None => Vec::new(),
        };

        Ok(Self {
            name: name.to_string(),
            internal_subset,
            id_attributes,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn internal_subset(&self) -> Option<&str> {
        self.internal_subset.as_deref()
    }

    pub fn id_attributes(&self) -> &[IdDeclaration] {
        &self.id_attributes
    }

    /// Attribute names declared as `ID` for the element with the given name
    pub fn id_attributes_for<'a>(&'a self, element: &'a str) -> impl Iterator<Item = &'a str> {
        self.id_attributes
            .iter()
            .filter(move |decl| decl.element == element)
            .map(|decl| decl.attribute.as_str())
    }

    /// Serialized `<!DOCTYPE ...>` declaration
    pub fn to_declaration(&self) -> String {
        match &self.internal_subset {
            Some(subset) => format!("<!DOCTYPE {} [ {} ]>", self.name, subset),
            None => format!("<!DOCTYPE {}>", self.name),
        }
    }
}

/// Collect `ID` typed attributes from all `<!ATTLIST>` declarations
fn parse_id_declarations(subset: &str) -> Result<Vec<IdDeclaration>> {
    let mut declarations = Vec::new();
    let mut rest = subset;

    while let Some(start) = rest.find("<!") {
        rest = &rest[start..];
        if let Some(comment) = rest.strip_prefix("<!--") {
            let end = comment
                .find("-->")
                .ok_or_else(|| Error::Doctype("unterminated comment".into()))?;
            rest = &comment[end + 3..];
            continue;
        }

        let end = markup_end(rest)
            .ok_or_else(|| Error::Doctype("unterminated markup declaration".into()))?;
        if let Some(body) = rest[..end].strip_prefix("<!ATTLIST") {
            declarations.extend(parse_attlist(body)?);
        }
        rest = &rest[end + 1..];
    }

    Ok(declarations)
}

/// Position of the `>` closing a markup declaration, skipping quoted literals
fn markup_end(decl: &str) -> Option<usize> {
    let mut quote = None;
    for (index, ch) in decl.char_indices() {
        match (quote, ch) {
            (Some(q), c) if c == q => quote = None,
            (Some(_), _) => {}
            (None, '"' | '\'') => quote = Some(ch),
            (None, '>') => return Some(index),
            _ => {}
        }
    }
    None
}

fn parse_attlist(body: &str) -> Result<Vec<IdDeclaration>> {
    let tokens = tokenize(body);
    let (element, definitions) = tokens
        .split_first()
        .ok_or_else(|| Error::Doctype("ATTLIST without element name".into()))?;

    let mut declarations = Vec::new();
    let mut iter = definitions.iter();
    while let Some(attribute) = iter.next() {
        let attr_type = iter
            .next()
            .ok_or_else(|| Error::Doctype(format!("missing type for attribute {attribute}")))?;
        let default = iter
            .next()
            .ok_or_else(|| Error::Doctype(format!("missing default for attribute {attribute}")))?;
        if default == "#FIXED" {
            iter.next();
        }
        if attr_type == "ID" {
            declarations.push(IdDeclaration {
                element: element.clone(),
                attribute: attribute.clone(),
            });
        }
    }
    Ok(declarations)
}

/// Split on whitespace, keeping quoted literals and parenthesised
/// enumerations as single tokens.
fn tokenize(body: &str) -> Vec<String> {
    let mut tokens = Vec::new();
    let mut current = String::new();
    let mut quote = None;
    let mut depth = 0usize;

    for ch in body.chars() {
        match ch {
            c if quote == Some(c) => {
                quote = None;
                current.push(c);
            }
            _ if quote.is_some() => current.push(ch),
            '"' | '\'' => {
                quote = Some(ch);
                current.push(ch);
            }
            '(' => {
                depth += 1;
                current.push(ch);
            }
            ')' => {
                depth = depth.saturating_sub(1);
                current.push(ch);
            }
            c if c.is_whitespace() && depth == 0 => {
                if !current.is_empty() {
                    tokens.push(std::mem::take(&mut current));
                }
            }
            c if c.is_whitespace() => {}
            _ => current.push(ch),
        }
    }
    if !current.is_empty() {
        tokens.push(current);
    }
    tokens
}
