#![allow(dead_code)]

use std::cell::RefCell;
use std::sync::OnceLock;

use regex::Regex;
use saml_idp::{
    dsig::SignatureOptions,
    saml::{
        ValidationLog,
        namespaces::{ASSERTION, PROTOCOL, formats, statuses},
    },
    testing::TestIdentity,
    xml::XmlDocument,
};

/// Key generation is slow, so the suites share one identity
pub fn identity() -> &'static TestIdentity {
    static IDENTITY: OnceLock<TestIdentity> = OnceLock::new();
    IDENTITY.get_or_init(|| TestIdentity::generate("idp.example.com").expect("identity"))
}

pub fn other_identity() -> &'static TestIdentity {
    static IDENTITY: OnceLock<TestIdentity> = OnceLock::new();
    IDENTITY.get_or_init(|| TestIdentity::generate("rogue.example.com").expect("identity"))
}

pub fn options() -> SignatureOptions {
    let identity = identity();
    SignatureOptions::new(identity.private_key.clone(), identity.certificate.clone())
}

pub fn saml_response() -> XmlDocument {
    XmlDocument::parse(format!(
        r#"<samlp:Response xmlns:samlp="{PROTOCOL}" xmlns:saml="{ASSERTION}" ID="_resp1" Version="2.0" Destination="https://sp.example.com/acs"><saml:Issuer>https://idp.example.com</saml:Issuer><samlp:Status><samlp:StatusCode Value="{success}"/></samlp:Status><saml:Assertion ID="_assert1" Version="2.0"><saml:Subject><saml:NameID Format="{email}">alice@example.com</saml:NameID></saml:Subject></saml:Assertion></samlp:Response>"#,
        success = statuses::SUCCESS,
        email = formats::name_id::EMAIL_ADDRESS,
    ))
    .expect("valid response")
}

/// First capture of `pattern` in `xml`
pub fn capture(pattern: &str, xml: &str) -> Option<String> {
    Regex::new(pattern)
        .expect("valid regex")
        .captures(xml)
        .and_then(|c| c.get(1))
        .map(|m| m.as_str().to_string())
}

#[derive(Default)]
pub struct RecordingLog(pub RefCell<Vec<String>>);

impl ValidationLog for RecordingLog {
    fn info(&self, message: &str) {
        self.0.borrow_mut().push(message.to_string());
    }
}

impl RecordingLog {
    pub fn messages(&self) -> Vec<String> {
        self.0.borrow().clone()
    }
}
