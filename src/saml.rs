//! SAML trust core: signing a document's root element and deciding whether
//! a received document's signature can be trusted.

mod error;
pub mod namespaces;
mod signer;
mod trust;
mod verifier;

pub use error::{SignError, ValidationError};
pub use signer::{
    dtd_element_name, id_doctype, relocate_signature, sign_root_element, strip_doctype,
    with_id_doctype,
};
pub use trust::{TrustAnchor, fingerprint_digest, normalize_fingerprint};
pub use verifier::{SignatureVerifier, TracingLog, ValidationLog, is_signature_valid};
