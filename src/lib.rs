//! Time-limited HMAC signatures carried in a URL's query string.
//!
//! [UrlSigner::sign] appends a `hash` parameter to a URL; [UrlSigner::verify] recomputes
//! it and checks the embedded expiry. [UrlSigner::middleware] and
//! [UrlSigner::verify_request] do the same for an inbound request described by a
//! [SignedRequest](request::SignedRequest).
//!
//! ```
//! use std::time::Duration;
//! use url_sign::{SignOptions, SignerConfig, UrlSigner, VerifyOptions};
//!
//! let signer = UrlSigner::new(SignerConfig::new("hidden")).unwrap();
//! let signed = signer
//!     .sign(
//!         "https://www.example.com/test?a=1&b=2",
//!         &SignOptions::new().method("get").ttl(Duration::from_secs(600)),
//!     )
//!     .unwrap();
//! assert!(signer.verify(&signed, &VerifyOptions::new().method("GET")));
//! assert!(!signer.verify(&signed, &VerifyOptions::new().method("PUT")));
//! ```
#![forbid(unsafe_code)]

mod algorithm;
pub mod canonical;
mod clock;
mod error;
pub mod request;
mod signer;

pub use algorithm::{
    SignatureAlgorithm,
    HmacSha256,
    HmacSha512,
};

pub use clock::{
    Clock,
    FixedClock,
    SystemClock,
};

pub use error::{
    ConfigError,
    InvalidSignature,
    SignError,
};

pub use signer::{
    SignOptions,
    SignerConfig,
    UrlSigner,
    VerifyOptions,
};
