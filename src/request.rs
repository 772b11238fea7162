use crate::algorithm::SignatureAlgorithm;
use crate::clock::Clock;
use crate::error::InvalidSignature;
use crate::signer::{UrlSigner, VerifyOptions};

/// This trait exposes the parts of an inbound HTTP request that are needed to rebuild
/// the URL it was addressed to and check the signature carried in its query string.
///
/// The [OwnedRequest] and [BorrowedRequest] types are provided for simple use cases
/// where you do not have preexisting structs representing HTTP requests. Support for
/// the [http](https://crates.io/crates/http) crate's `Request` type is enabled with the
/// `http` **feature**, which is off by default.
pub trait SignedRequest {
    /// The scheme the request arrived over, such as `https`.
    fn protocol(&self) -> &str;

    /// The host the client addressed, including any port. Usually the `Host` header.
    fn host(&self) -> Option<&str>;

    /// The path and query string exactly as the client sent them.
    fn original_url(&self) -> &str;

    /// The HTTP method.
    fn method(&self) -> &str;

    /// The URL the request was addressed to. Falls back to the bare path and query when
    /// no host is known.
    fn full_url(&self) -> String {
        let original_url = self.original_url();
        let host = match self.host().map(str::trim).filter(|host| !host.is_empty()) {
            Some(host) => host,
            None => return original_url.to_string(),
        };
        let protocol = self.protocol().trim_end_matches(':');
        let slash = if original_url.starts_with('/') { "" } else { "/" };
        format!("{}://{}{}{}", protocol, host, slash, original_url)
    }
}

/// A simple implementation of [SignedRequest] that owns all of the request data.
#[derive(Debug, Clone, Eq, PartialEq)]
pub struct OwnedRequest {
    protocol: String,
    host: Option<String>,
    original_url: String,
    method: String,
}

impl OwnedRequest {
    pub fn new(
            method: impl Into<String>,
            protocol: impl Into<String>,
            host: Option<String>,
            original_url: impl Into<String>) -> Self {
        Self {
            protocol: protocol.into(),
            host,
            original_url: original_url.into(),
            method: method.into(),
        }
    }
}

impl SignedRequest for OwnedRequest {
    fn protocol(&self) -> &str {
        &self.protocol
    }

    fn host(&self) -> Option<&str> {
        self.host.as_deref()
    }

    fn original_url(&self) -> &str {
        &self.original_url
    }

    fn method(&self) -> &str {
        &self.method
    }
}

/// A simple implementation of [SignedRequest] that borrows all of the request data.
#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub struct BorrowedRequest<'request> {
    protocol: &'request str,
    host: Option<&'request str>,
    original_url: &'request str,
    method: &'request str,
}

impl<'request> BorrowedRequest<'request> {
    pub fn new(
            method: &'request str,
            protocol: &'request str,
            host: Option<&'request str>,
            original_url: &'request str) -> Self {
        Self {
            protocol,
            host,
            original_url,
            method,
        }
    }
}

impl<'request> SignedRequest for BorrowedRequest<'request> {
    fn protocol(&self) -> &str {
        self.protocol
    }

    fn host(&self) -> Option<&str> {
        self.host
    }

    fn original_url(&self) -> &str {
        self.original_url
    }

    fn method(&self) -> &str {
        self.method
    }
}

impl<Alg: SignatureAlgorithm, Clk: Clock> UrlSigner<Alg, Clk> {
    /// Check the signature of an inbound request, bound to the request's method.
    pub fn verify_request<R: SignedRequest + ?Sized>(&self, request: &R) -> Result<(), InvalidSignature> {
        let url = request.full_url();
        self.check(&url, &VerifyOptions::new().method(request.method()))
    }

    /// Continuation-style adapter for request pipelines: `next` receives `None` when the
    /// request is correctly signed and `Some(InvalidSignature)` otherwise, and its result
    /// is handed back to the caller.
    pub fn middleware<R, Next, T>(&self, request: &R, next: Next) -> T
        where
            R: SignedRequest + ?Sized,
            Next: FnOnce(Option<InvalidSignature>) -> T,
    {
        next(self.verify_request(request).err())
    }
}

/// Adds support for using the [http](https://crates.io/crates/http) crate's `Request`
/// as an implementation of [SignedRequest].
///
/// Requires the `http` feature to be enabled.
#[cfg(feature = "http")]
mod http {
    use super::SignedRequest;

    impl<Body> SignedRequest for ::http::Request<Body> {
        fn protocol(&self) -> &str {
            self.uri().scheme_str().unwrap_or("http")
        }

        fn host(&self) -> Option<&str> {
            self.headers()
                .get(::http::header::HOST)
                .and_then(|value| value.to_str().ok())
                .or_else(|| self.uri().authority().map(|authority| without_userinfo(authority.as_str())))
        }

        fn original_url(&self) -> &str {
            self.uri()
                .path_and_query()
                .map(|path_and_query| path_and_query.as_str())
                .unwrap_or("/")
        }

        fn method(&self) -> &str {
            self.method().as_str()
        }
    }

    /// `user:password@host:port` becomes `host:port`.
    fn without_userinfo(authority: &str) -> &str {
        authority.rsplit_once('@').map_or(authority, |(_, host)| host)
    }
}
