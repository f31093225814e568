#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("XML parsing error: {0}")]
    Parse(#[from] quick_xml::Error),

    #[error("XML attribute error: {0}")]
    Attribute(#[from] quick_xml::events::attributes::AttrError),

    #[error("XML escape error: {0}")]
    Escape(#[from] quick_xml::escape::EscapeError),

    #[error("UTF-8 error: {0}")]
    Utf8(#[from] std::str::Utf8Error),

    #[error("Malformed document: {0}")]
    Malformed(String),

    #[error("Unsupported DOCTYPE: {0}")]
    Doctype(String),

    #[error("XPath error: {0}")]
    XPath(String),

    #[error("Node not found: {0}")]
    NodeNotFound(String),
}
