//! Credential handling and SSRF protection for page fetches.

pub mod credentials;
pub mod url_validator;

pub use credentials::{AICredentials, SecretString};
pub use url_validator::UrlValidator;
