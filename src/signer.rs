use std::fmt::Debug;
use std::time::Duration;

use bytes::BytesMut;
use thiserror::Error;
use tracing::{debug, trace};

use crate::algorithm::{HmacSha256, SignatureAlgorithm};
use crate::canonical::{build_canonical_input, CanonicalOptions, UrlParts, HASH_PARAM};
use crate::clock::{Clock, SystemClock};
use crate::error::{ConfigError, InvalidSignature, SignError};

/// Process-wide signer configuration. Build it once and hand it to [UrlSigner::new].
#[derive(Clone)]
pub struct SignerConfig {
    secret: Vec<u8>,
    ignore_hostname: bool,
}

impl SignerConfig {
    pub fn new(secret: impl Into<Vec<u8>>) -> Self {
        Self {
            secret: secret.into(),
            ignore_hostname: false,
        }
    }

    /// Leave the host out of every signature unless a call overrides it.
    pub fn ignore_hostname(mut self, ignore_hostname: bool) -> Self {
        self.ignore_hostname = ignore_hostname;
        self
    }
}

impl Debug for SignerConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SignerConfig")
            .field("secret", &"<redacted>")
            .field("ignore_hostname", &self.ignore_hostname)
            .finish()
    }
}

/// Per-call options for [UrlSigner::sign].
#[derive(Debug, Default, Clone, Eq, PartialEq)]
pub struct SignOptions {
    method: Option<String>,
    ttl: Option<Duration>,
    ignore_hostname: Option<bool>,
}

impl SignOptions {
    pub fn new() -> Self {
        Self::default()
    }

    /// Bind the signature to an HTTP method. The same method must be passed when
    /// verifying.
    pub fn method(mut self, method: impl Into<String>) -> Self {
        self.method = Some(method.into());
        self
    }

    /// How long the signature stays valid. Expiry is recorded at whole-second
    /// granularity, rounded up. Without a ttl the signature never expires.
    pub fn ttl(mut self, ttl: Duration) -> Self {
        self.ttl = Some(ttl);
        self
    }

    /// Override the signer's hostname setting for this call.
    pub fn ignore_hostname(mut self, ignore_hostname: bool) -> Self {
        self.ignore_hostname = Some(ignore_hostname);
        self
    }
}

/// Per-call options for [UrlSigner::verify].
#[derive(Debug, Default, Clone, Eq, PartialEq)]
pub struct VerifyOptions {
    method: Option<String>,
    ignore_hostname: Option<bool>,
}

impl VerifyOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn method(mut self, method: impl Into<String>) -> Self {
        self.method = Some(method.into());
        self
    }

    /// Override the signer's hostname setting. Left unset, a host-bound signature that
    /// does not match is also checked as a host-independent one; `false` forbids that.
    pub fn ignore_hostname(mut self, ignore_hostname: bool) -> Self {
        self.ignore_hostname = Some(ignore_hostname);
        self
    }
}

impl From<&SignOptions> for VerifyOptions {
    fn from(options: &SignOptions) -> Self {
        Self {
            method: options.method.clone(),
            ignore_hostname: options.ignore_hostname,
        }
    }
}

/// Why a signature was rejected. Only ever logged; callers see [InvalidSignature].
#[derive(Debug, Error)]
enum Rejection {
    #[error("URL could not be parsed: {0}")]
    MalformedUrl(SignError),
    #[error("no hash parameter")]
    MissingHash,
    #[error("hash parameter is malformed")]
    MalformedHash,
    #[error("signature expired at {expires}")]
    Expired { expires: u64 },
    #[error("signature does not match")]
    Mismatch,
}

/// Signs URLs and verifies signed URLs with a fixed secret.
///
/// A signed URL carries a `hash` query parameter of the form `<digest>.<expiry>`, or
/// just `<digest>` when it never expires. The digest is the unpadded base64url
/// signature of the [canonical input](crate::canonical), and the expiry is the
/// unpadded base64url encoding of the decimal Unix timestamp in seconds.
///
/// The signer holds no mutable state, so one instance can be shared between threads.
pub struct UrlSigner<Alg = HmacSha256, Clk = SystemClock> {
    algorithm: Alg,
    clock: Clk,
    ignore_hostname: bool,
}

impl UrlSigner {
    /// Build an HMAC-SHA256 signer reading the system clock.
    pub fn new(config: SignerConfig) -> Result<Self, ConfigError> {
        if config.secret.is_empty() {
            return Err(ConfigError::EmptySecret);
        }
        Ok(Self::from_parts(
            HmacSha256::new(&config.secret),
            SystemClock,
            config.ignore_hostname,
        ))
    }
}

impl<Alg, Clk> UrlSigner<Alg, Clk> {
    pub fn from_parts(algorithm: Alg, clock: Clk, ignore_hostname: bool) -> Self {
        Self {
            algorithm,
            clock,
            ignore_hostname,
        }
    }

    /// Replace the time source, keeping the key and settings.
    pub fn with_clock<NewClk>(self, clock: NewClk) -> UrlSigner<Alg, NewClk> {
        UrlSigner {
            algorithm: self.algorithm,
            clock,
            ignore_hostname: self.ignore_hostname,
        }
    }

    pub fn clock(&self) -> &Clk {
        &self.clock
    }
}

impl<Alg: SignatureAlgorithm, Clk: Clock> UrlSigner<Alg, Clk> {
    /// Return `url` with a `hash` parameter appended. Existing parameters keep their
    /// order; an existing `hash` parameter is replaced.
    pub fn sign(&self, url: &str, options: &SignOptions) -> Result<String, SignError> {
        let parts = UrlParts::parse(url)?;
        let expires = options
            .ttl
            .map(|ttl| expiry_seconds(self.clock.now_millis(), ttl));
        let mut temporary_buffer = BytesMut::with_capacity(url.len() + 64);
        let signature_input = build_canonical_input(
            &mut temporary_buffer,
            &parts,
            &CanonicalOptions {
                method: options.method.as_deref(),
                ignore_hostname: options.ignore_hostname.unwrap_or(self.ignore_hostname),
                expires,
            },
        );
        trace!(input = %String::from_utf8_lossy(&signature_input), "Built canonical input");

        let mut hash = self.encoded_signature(&signature_input)?;
        if let Some(expires) = expires {
            hash.push('.');
            hash.push_str(&encode_expiry(expires));
        }

        debug!(
            algorithm = self.algorithm.name(),
            path = parts.path,
            expires = ?expires,
            "Signed URL"
        );
        Ok(append_hash(url, &parts, &hash))
    }

    /// True when `url` carries a signature that matches and has not expired.
    pub fn verify(&self, url: &str, options: &VerifyOptions) -> bool {
        self.check(url, options).is_ok()
    }

    /// [verify](Self::verify) as a `Result`.
    pub fn check(&self, url: &str, options: &VerifyOptions) -> Result<(), InvalidSignature> {
        self.check_signature(url, options).map_err(|rejection| {
            debug!(reason = %rejection, "Rejected URL signature");
            InvalidSignature
        })
    }

    fn check_signature(&self, url: &str, options: &VerifyOptions) -> Result<(), Rejection> {
        let parts = UrlParts::parse(url).map_err(Rejection::MalformedUrl)?;
        let hash = parts
            .query_pairs()
            .find(|(key, _)| *key == HASH_PARAM)
            .map(|(_, value)| value)
            .ok_or(Rejection::MissingHash)?;
        let (signature, expires) = decode_hash(hash).ok_or(Rejection::MalformedHash)?;

        if let Some(expires) = expires {
            if self.clock.now_millis() > expires.saturating_mul(1000) {
                return Err(Rejection::Expired { expires });
            }
        }

        let ignore_hostname = options.ignore_hostname.unwrap_or(self.ignore_hostname);
        let mut temporary_buffer = BytesMut::with_capacity(url.len() + 64);
        let mut canonical = CanonicalOptions {
            method: options.method.as_deref(),
            ignore_hostname,
            expires,
        };
        if self.signature_matches(&mut temporary_buffer, &parts, &canonical, &signature) {
            debug!(algorithm = self.algorithm.name(), path = parts.path, "Verified URL signature");
            return Ok(());
        }

        // A URL signed with a per-call hostname override carries a digest over the
        // host-less input. Only an explicit `ignore_hostname(false)` rules that out.
        if !ignore_hostname && options.ignore_hostname.is_none() && parts.host.is_some() {
            canonical.ignore_hostname = true;
            if self.signature_matches(&mut temporary_buffer, &parts, &canonical, &signature) {
                debug!(
                    algorithm = self.algorithm.name(),
                    path = parts.path,
                    "Verified host-independent URL signature"
                );
                return Ok(());
            }
        }

        Err(Rejection::Mismatch)
    }

    fn signature_matches(
            &self,
            temporary_buffer: &mut BytesMut,
            parts: &UrlParts<'_>,
            canonical: &CanonicalOptions<'_>,
            signature: &[u8],
        ) -> bool {
        let signature_input = build_canonical_input(temporary_buffer, parts, canonical);
        trace!(input = %String::from_utf8_lossy(&signature_input), "Built canonical input");
        self.algorithm.verify(&signature_input, signature)
    }

    fn encoded_signature(&self, signature_input: &[u8]) -> Result<String, SignError> {
        let mut signature = Vec::with_capacity(64);
        self.algorithm
            .sign(signature_input, &mut signature)
            .map_err(|_err| SignError::Internal("IO error when signing"))?;
        Ok(base64::encode_config(&signature, base64::URL_SAFE_NO_PAD))
    }
}

impl<Alg: Debug, Clk: Debug> Debug for UrlSigner<Alg, Clk> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("UrlSigner")
            .field("algorithm", &self.algorithm)
            .field("clock", &self.clock)
            .field("ignore_hostname", &self.ignore_hostname)
            .finish()
    }
}

/// `now + ttl` in whole seconds, rounded up.
fn expiry_seconds(now_millis: u64, ttl: Duration) -> u64 {
    let ttl_millis = u64::try_from(ttl.as_millis()).unwrap_or(u64::MAX);
    let expires_millis = now_millis.saturating_add(ttl_millis);
    expires_millis / 1000 + u64::from(expires_millis % 1000 != 0)
}

fn encode_expiry(expires: u64) -> String {
    base64::encode_config(expires.to_string(), base64::URL_SAFE_NO_PAD)
}

/// Accepts the base64url-encoded decimal form written by [UrlSigner::sign] as well as a
/// plain decimal timestamp.
fn decode_expiry(encoded: &str) -> Option<u64> {
    base64::decode_config(encoded, base64::URL_SAFE_NO_PAD)
        .ok()
        .and_then(|decoded| String::from_utf8(decoded).ok())
        .and_then(|decimal| decimal.parse().ok())
        .or_else(|| encoded.parse().ok())
}

fn decode_hash(hash: &str) -> Option<(Vec<u8>, Option<u64>)> {
    let (signature, expires) = match hash.split_once('.') {
        Some((signature, expires)) => (signature, Some(decode_expiry(expires)?)),
        None => (hash, None),
    };
    if signature.is_empty() {
        return None;
    }
    let signature = base64::decode_config(signature, base64::URL_SAFE_NO_PAD).ok()?;
    Some((signature, expires))
}

fn append_hash(url: &str, parts: &UrlParts<'_>, hash: &str) -> String {
    let base_end = url.find(|c: char| c == '?' || c == '#').unwrap_or(url.len());
    let mut signed = String::with_capacity(url.len() + hash.len() + 6);
    signed.push_str(&url[..base_end]);

    let mut separator = '?';
    let kept = parts
        .query
        .unwrap_or("")
        .split('&')
        .filter(|param| !param.is_empty())
        .filter(|param| param.split_once('=').map_or(*param, |(key, _)| key) != HASH_PARAM);
    for param in kept {
        signed.push(separator);
        signed.push_str(param);
        separator = '&';
    }
    signed.push(separator);
    signed.push_str(HASH_PARAM);
    signed.push('=');
    signed.push_str(hash);

    if let Some(fragment) = parts.fragment {
        signed.push('#');
        signed.push_str(fragment);
    }
    signed
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::algorithm::HmacSha512;
    use crate::clock::FixedClock;

    const NOW: u64 = 1_570_710_900_371;

    fn test_signer() -> UrlSigner<HmacSha256, FixedClock> {
        UrlSigner::new(SignerConfig::new("hidden"))
            .unwrap()
            .with_clock(FixedClock::new(NOW))
    }

    fn hash_of(url: &str) -> &str {
        let (_, hash) = url.split_once("hash=").unwrap();
        hash
    }

    #[test]
    fn test_should_reject_empty_secret() {
        assert_eq!(
            UrlSigner::new(SignerConfig::new("")).unwrap_err(),
            ConfigError::EmptySecret
        );
    }

    #[test]
    fn test_should_round_expiry_up_to_whole_seconds() {
        assert_eq!(expiry_seconds(NOW, Duration::from_secs(600)), 1_570_711_501);
        assert_eq!(expiry_seconds(1_000, Duration::from_secs(1)), 2);
        assert_eq!(expiry_seconds(u64::MAX, Duration::from_secs(1)), u64::MAX / 1000 + 1);
    }

    #[test]
    fn test_should_encode_and_decode_expiry() {
        assert_eq!(encode_expiry(1_570_711_501), "MTU3MDcxMTUwMQ");
        assert_eq!(decode_expiry("MTU3MDcxMTUwMQ"), Some(1_570_711_501));
        assert_eq!(decode_expiry("1570711501"), Some(1_570_711_501));
        assert_eq!(decode_expiry("not-a-time"), None);
    }

    #[test]
    fn test_should_decode_hash_forms() {
        let (signature, expires) = decode_hash("AAEC.MTU3MDcxMTUwMQ").unwrap();
        assert_eq!(signature, vec![0, 1, 2]);
        assert_eq!(expires, Some(1_570_711_501));

        let (signature, expires) = decode_hash("AAEC").unwrap();
        assert_eq!(signature, vec![0, 1, 2]);
        assert_eq!(expires, None);

        assert!(decode_hash("").is_none());
        assert!(decode_hash(".MTU3MDcxMTUwMQ").is_none());
        assert!(decode_hash("AAEC.MTU3.MDcx").is_none());
        assert!(decode_hash("fubar").is_none());
    }

    #[test]
    fn test_should_sign_with_expiry_suffix() {
        let signer = test_signer();
        let options = SignOptions::new()
            .method("get")
            .ttl(Duration::from_secs(600))
            .ignore_hostname(true);
        let signed = signer
            .sign("https://www.example.com/test?a=1&b=2", &options)
            .unwrap();

        assert!(signed.starts_with("https://www.example.com/test?a=1&b=2&hash="));
        let (digest, expires) = hash_of(&signed).split_once('.').unwrap();
        assert_eq!(digest.len(), 43);
        assert_eq!(expires, "MTU3MDcxMTUwMQ");
    }

    #[test]
    fn test_should_sign_without_expiry_when_no_ttl() {
        let signer = test_signer();
        let signed = signer.sign("https://www.example.com/test", &SignOptions::new()).unwrap();
        assert!(signed.starts_with("https://www.example.com/test?hash="));
        assert!(!hash_of(&signed).contains('.'));

        signer.clock().advance(Duration::from_secs(10 * 365 * 24 * 3600));
        assert!(signer.verify(&signed, &VerifyOptions::new()));
    }

    #[test]
    fn test_should_replace_existing_hash_and_keep_fragment() {
        let signer = test_signer();
        let signed = signer
            .sign("/files?b=2&hash=old&a=1#section", &SignOptions::new())
            .unwrap();
        assert!(signed.starts_with("/files?b=2&a=1&hash="));
        assert!(signed.ends_with("#section"));
        assert_eq!(signed.matches("hash=").count(), 1);
        assert!(signer.verify(&signed, &VerifyOptions::new()));
    }

    #[test]
    fn test_should_not_depend_on_parameter_order() {
        let signer = test_signer();
        let signed = signer.sign("/p?a=1&b=2", &SignOptions::new()).unwrap();
        let reordered = format!("/p?b=2&hash={}&a=1", hash_of(&signed));
        assert!(signer.verify(&reordered, &VerifyOptions::new()));
    }

    #[test]
    fn test_should_verify_at_exact_expiry_and_reject_after() {
        let signer = test_signer();
        let options = SignOptions::new().ttl(Duration::from_secs(600));
        let signed = signer.sign("https://example.com/file", &options).unwrap();

        signer.clock().set(1_570_711_501_000);
        assert!(signer.verify(&signed, &VerifyOptions::new()));
        signer.clock().set(1_570_711_501_001);
        assert!(!signer.verify(&signed, &VerifyOptions::new()));
    }

    #[test]
    fn test_should_reject_tampered_expiry() {
        let signer = test_signer();
        let options = SignOptions::new().ttl(Duration::from_secs(600));
        let signed = signer.sign("https://example.com/file", &options).unwrap();
        let extended = signed.replace("MTU3MDcxMTUwMQ", &encode_expiry(1_670_711_501));
        assert!(!signer.verify(&extended, &VerifyOptions::new()));
    }

    #[test]
    fn test_should_accept_plain_decimal_expiry() {
        let signer = test_signer();
        let options = SignOptions::new().ttl(Duration::from_secs(600));
        let signed = signer.sign("https://example.com/file", &options).unwrap();
        let decimal = signed.replace("MTU3MDcxMTUwMQ", "1570711501");
        assert!(signer.verify(&decimal, &VerifyOptions::new()));
    }

    #[test]
    fn test_should_reject_missing_hash_and_malformed_url() {
        let signer = test_signer();
        assert!(!signer.verify("https://example.com/file?a=1", &VerifyOptions::new()));
        assert!(!signer.verify("https:///file?hash=abc", &VerifyOptions::new()));
        assert_eq!(
            signer.check("https://example.com/file?hash=", &VerifyOptions::new()),
            Err(InvalidSignature)
        );
    }

    #[test]
    fn test_should_honour_per_call_hostname_override() {
        let signer = test_signer();
        let signed = signer
            .sign("https://a.example.com/p", &SignOptions::new().ignore_hostname(true))
            .unwrap();
        let moved = signed.replace("a.example.com", "b.example.com");

        assert!(!signer.verify(&moved, &VerifyOptions::new().ignore_hostname(false)));
        assert!(signer.verify(&moved, &VerifyOptions::new().ignore_hostname(true)));
        assert!(signer.verify(&moved, &VerifyOptions::new()));
    }

    #[test]
    fn test_should_not_drop_host_from_host_bound_signature() {
        let signer = test_signer();
        let signed = signer.sign("https://a.example.com/p", &SignOptions::new()).unwrap();
        let moved = signed.replace("a.example.com", "b.example.com");
        assert!(signer.verify(&signed, &VerifyOptions::new()));
        assert!(!signer.verify(&moved, &VerifyOptions::new()));
    }

    #[test]
    fn test_should_derive_verify_options_from_sign_options() {
        let signer = test_signer();
        let options = SignOptions::new().method("delete").ignore_hostname(true);
        let signed = signer.sign("https://example.com/item/7", &options).unwrap();
        assert!(signer.verify(&signed, &VerifyOptions::from(&options)));
    }

    #[test]
    fn test_should_sign_with_other_algorithm() {
        let signer = UrlSigner::from_parts(HmacSha512::new("hidden"), FixedClock::new(NOW), false);
        let signed = signer.sign("/p", &SignOptions::new()).unwrap();
        assert_eq!(hash_of(&signed).len(), 86);
        assert!(signer.verify(&signed, &VerifyOptions::new()));
        assert!(!test_signer().verify(&signed, &VerifyOptions::new()));
    }

    #[test]
    fn test_should_redact_secret_in_debug_output() {
        let debug = format!("{:?}", SignerConfig::new("hidden"));
        assert!(!debug.contains("hidden"));
        assert!(debug.contains("<redacted>"));
    }

    #[test]
    fn test_should_be_shareable_between_threads() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<UrlSigner>();
        assert_send_sync::<UrlSigner<HmacSha256, FixedClock>>();
    }
}
