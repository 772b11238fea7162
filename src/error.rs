use thiserror::Error;

/// Problems with a [SignerConfig](crate::SignerConfig) detected when building a
/// [UrlSigner](crate::UrlSigner).
#[derive(Debug, Error, Eq, PartialEq)]
pub enum ConfigError {
    /// The secret was empty.
    #[error("signing secret must not be empty")]
    EmptySecret,
}

#[derive(Debug, Error, Eq, PartialEq)]
pub enum SignError {
    /// The URL could not be split into its components.
    #[error("malformed URL: {0}")]
    MalformedUrl(String),

    /// An unexpected internal error.
    #[error("internal error: {0}")]
    Internal(&'static str),
}

/// The signature carried by a URL or request is missing, malformed, expired, or does
/// not match. Callers cannot tell these cases apart.
#[derive(Debug, Error, Clone, Copy, Eq, PartialEq)]
#[error("invalid or expired URL signature")]
pub struct InvalidSignature;
