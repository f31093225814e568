//! SAML 2.0 and XML-DSig vocabulary shared by signing, verification and
//! metadata generation.

pub const METADATA: &str = "urn:oasis:names:tc:SAML:2.0:metadata";
pub const ASSERTION: &str = "urn:oasis:names:tc:SAML:2.0:assertion";
pub const SIGNATURE: &str = "http://www.w3.org/2000/09/xmldsig#";
pub const PROTOCOL: &str = "urn:oasis:names:tc:SAML:2.0:protocol";

pub mod statuses {
    pub const SUCCESS: &str = "urn:oasis:names:tc:SAML:2.0:status:Success";
}

pub mod consents {
    pub const UNSPECIFIED: &str = "urn:oasis:names:tc:SAML:2.0:consent:unspecified";
}

pub mod authn_context {
    pub mod class_ref {
        pub const PASSWORD: &str = "urn:oasis:names:tc:SAML:2.0:ac:classes:Password";
        pub const PASSWORD_PROTECTED: &str =
            "urn:oasis:names:tc:SAML:2.0:ac:classes:PasswordProtectedTransport";
    }
}

pub mod methods {
    pub const BEARER: &str = "urn:oasis:names:tc:SAML:2.0:cm:bearer";
}

pub mod formats {
    pub mod attr {
        pub const URI: &str = "urn:oasis:names:tc:SAML:2.0:attrname-format:uri";
    }

    pub mod name_id {
        pub const EMAIL_ADDRESS: &str = "urn:oasis:names:tc:SAML:1.1:nameid-format:emailAddress";
        pub const TRANSIENT: &str = "urn:oasis:names:tc:SAML:2.0:nameid-format:transient";
        pub const PERSISTENT: &str = "urn:oasis:names:tc:SAML:2.0:nameid-format:persistent";
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_saml_urns_share_the_oasis_prefix() {
        for urn in [
            METADATA,
            ASSERTION,
            PROTOCOL,
            statuses::SUCCESS,
            consents::UNSPECIFIED,
            authn_context::class_ref::PASSWORD,
            authn_context::class_ref::PASSWORD_PROTECTED,
            methods::BEARER,
            formats::attr::URI,
            formats::name_id::EMAIL_ADDRESS,
            formats::name_id::TRANSIENT,
            formats::name_id::PERSISTENT,
        ] {
            assert!(urn.starts_with("urn:oasis:names:tc:SAML:"), "{urn}");
        }
    }

    #[test]
    fn test_email_format_is_saml_1_1() {
        assert!(formats::name_id::EMAIL_ADDRESS.contains(":SAML:1.1:"));
        assert_eq!(SIGNATURE, crate::dsig::ns::DS);
    }
}
