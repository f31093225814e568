pub mod config;
pub mod crypto;
pub mod dsig;
pub mod saml;
pub mod telemetry;
pub mod testing;
pub mod xml;
