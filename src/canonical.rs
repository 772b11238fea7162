//! Canonical signature input for a URL.
//!
//! The canonical input is one `label: value` line per signed element, always in this
//! order:
//!
//! ```text
//! method: GET
//! host: www.example.com
//! path: /test
//! query: a=1&b=2
//! expires: 1570711501
//! ```
//!
//! `method` is only present when a method was given, `host` only when the URL has a host
//! and hostnames are not ignored, and `expires` only when the signature has a lifetime.
//! `path` and `query` are always present. Query parameters are sorted by key and the
//! `hash` parameter carrying the signature itself is left out.

use bytes::BytesMut;

use crate::error::SignError;

/// Name of the query parameter that carries the signature.
pub const HASH_PARAM: &str = "hash";

/// A URL split into the pieces that take part in signing. Nothing is decoded or
/// re-encoded, every piece borrows from the original string.
#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub struct UrlParts<'a> {
    pub scheme: Option<&'a str>,
    /// Host including any port.
    pub host: Option<&'a str>,
    pub path: &'a str,
    /// The query string, without the leading `'?'`.
    pub query: Option<&'a str>,
    pub fragment: Option<&'a str>,
}

impl<'a> UrlParts<'a> {
    /// Split an absolute (`https://host/path?query`), scheme-relative (`//host/path`) or
    /// origin-relative (`/path?query`) URL.
    pub fn parse(url: &'a str) -> Result<Self, SignError> {
        let (rest, fragment) = match url.split_once('#') {
            Some((rest, fragment)) => (rest, Some(fragment)),
            None => (url, None),
        };
        let (rest, query) = match rest.split_once('?') {
            Some((rest, query)) => (rest, Some(query)),
            None => (rest, None),
        };

        let (scheme, host, path) = if let Some((scheme, after_scheme)) = rest.split_once("://") {
            if !is_valid_scheme(scheme) {
                return Err(SignError::MalformedUrl(format!("invalid scheme in {:?}", url)));
            }
            let (host, path) = split_authority(after_scheme);
            if host.is_empty() {
                return Err(SignError::MalformedUrl(format!("missing host in {:?}", url)));
            }
            (Some(scheme), Some(host), path)
        } else if let Some(after_slashes) = rest.strip_prefix("//") {
            let (host, path) = split_authority(after_slashes);
            if host.is_empty() {
                return Err(SignError::MalformedUrl(format!("missing host in {:?}", url)));
            }
            (None, Some(host), path)
        } else {
            (None, None, rest)
        };

        Ok(Self {
            scheme,
            host,
            path,
            query,
            fragment,
        })
    }

    /// The raw `key=value` pairs of the query string, in their original order. A
    /// parameter without `'='` has an empty value.
    pub fn query_pairs(&self) -> impl Iterator<Item = (&'a str, &'a str)> + 'a {
        self.query
            .unwrap_or("")
            .split('&')
            .filter(|param| !param.is_empty())
            .map(|param| param.split_once('=').unwrap_or((param, "")))
    }
}

fn is_valid_scheme(scheme: &str) -> bool {
    let mut chars = scheme.chars();
    matches!(chars.next(), Some(first) if first.is_ascii_alphabetic())
        && chars.all(|c| c.is_ascii_alphanumeric() || matches!(c, '+' | '-' | '.'))
}

fn split_authority(after_scheme: &str) -> (&str, &str) {
    match after_scheme.find('/') {
        Some(slash) => after_scheme.split_at(slash),
        None => (after_scheme, ""),
    }
}

/// What besides the URL itself goes into the canonical input.
#[derive(Debug, Default, Clone, Copy, Eq, PartialEq)]
pub struct CanonicalOptions<'a> {
    /// HTTP method, compared case-insensitively.
    pub method: Option<&'a str>,
    /// Leave the host out so the signature holds for any host.
    pub ignore_hostname: bool,
    /// Expiry as seconds since the Unix epoch.
    pub expires: Option<u64>,
}

/// Write the canonical input for `url` into `temporary_buffer` and split it off.
pub fn build_canonical_input(
        temporary_buffer: &mut BytesMut,
        url: &UrlParts<'_>,
        options: &CanonicalOptions<'_>,
    ) -> BytesMut {
    temporary_buffer.clear();

    let method = options.method.map(str::trim).filter(|method| !method.is_empty());
    if let Some(method) = method {
        temporary_buffer.extend_from_slice(b"method: ");
        temporary_buffer.extend_from_slice(method.to_ascii_uppercase().as_bytes());
        temporary_buffer.extend_from_slice(b"\n");
    }

    if let (Some(host), false) = (url.host, options.ignore_hostname) {
        temporary_buffer.extend_from_slice(b"host: ");
        temporary_buffer.extend_from_slice(host.to_ascii_lowercase().as_bytes());
        temporary_buffer.extend_from_slice(b"\n");
    }

    temporary_buffer.extend_from_slice(b"path: ");
    temporary_buffer.extend_from_slice(if url.path.is_empty() { "/" } else { url.path }.as_bytes());
    temporary_buffer.extend_from_slice(b"\n");

    // sort_by is stable, so repeated keys keep their relative order.
    let mut params: Vec<(&str, &str)> = url
        .query_pairs()
        .filter(|(key, _)| *key != HASH_PARAM)
        .collect();
    params.sort_by(|left, right| left.0.cmp(right.0));

    temporary_buffer.extend_from_slice(b"query: ");
    for (index, (key, value)) in params.iter().enumerate() {
        if index > 0 {
            temporary_buffer.extend_from_slice(b"&");
        }
        temporary_buffer.extend_from_slice(key.as_bytes());
        temporary_buffer.extend_from_slice(b"=");
        temporary_buffer.extend_from_slice(value.as_bytes());
    }
    temporary_buffer.extend_from_slice(b"\n");

    if let Some(expires) = options.expires {
        temporary_buffer.extend_from_slice(b"expires: ");
        temporary_buffer.extend_from_slice(expires.to_string().as_bytes());
        temporary_buffer.extend_from_slice(b"\n");
    }

    temporary_buffer.split()
}

/// Compute the canonical input for `url` as a string.
///
/// # Examples
///
/// ```
/// use url_sign::canonical::{canonicalize, CanonicalOptions};
///
/// let canonical = canonicalize(
///     "https://www.example.com/test?b=2&a=1",
///     &CanonicalOptions { method: Some("get"), ..Default::default() },
/// ).unwrap();
/// assert_eq!(canonical, "method: GET\nhost: www.example.com\npath: /test\nquery: a=1&b=2\n");
/// ```
pub fn canonicalize(url: &str, options: &CanonicalOptions<'_>) -> Result<String, SignError> {
    let parts = UrlParts::parse(url)?;
    let mut temporary_buffer = BytesMut::with_capacity(url.len() + 64);
    let input = build_canonical_input(&mut temporary_buffer, &parts, options);
    Ok(String::from_utf8_lossy(&input).into_owned())
}
