use std::{fmt::Debug, io::Write};

use ring::hmac;

/// The keyed algorithm used to compute a URL signature from its canonical string. The
/// canonicalization algorithm is shared by every signature algorithm, so this trait only
/// covers producing and checking the raw signature bytes.
pub trait SignatureAlgorithm {
    /// A short name for the algorithm, used in log output.
    fn name(&self) -> &str;

    /// Sign a block of data, writing the raw signature bytes to `output`.
    fn sign(&self, data: &[u8], output: &mut dyn Write) -> std::io::Result<()>;

    /// Check that `signature` is the signature of `data`. Implementations must compare
    /// in constant time.
    fn verify(&self, data: &[u8], signature: &[u8]) -> bool;
}

/// HMAC with SHA-256. This is the algorithm used by
/// [UrlSigner::new](crate::UrlSigner::new).
pub struct HmacSha256 {
    key: hmac::Key,
}

impl HmacSha256 {
    pub fn new(secret: impl AsRef<[u8]>) -> Self {
        Self {
            key: hmac::Key::new(hmac::HMAC_SHA256, secret.as_ref()),
        }
    }
}

impl SignatureAlgorithm for HmacSha256 {
    fn name(&self) -> &str {
        "hmac-sha256"
    }

    fn sign(&self, data: &[u8], output: &mut dyn Write) -> std::io::Result<()> {
        output.write_all(hmac::sign(&self.key, data).as_ref())
    }

    fn verify(&self, data: &[u8], signature: &[u8]) -> bool {
        hmac::verify(&self.key, data, signature).is_ok()
    }
}

impl Debug for HmacSha256 {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        // Never print key material.
        f.debug_struct("HmacSha256").finish_non_exhaustive()
    }
}

/// HMAC with SHA-512, for deployments that want a longer digest.
pub struct HmacSha512 {
    key: hmac::Key,
}

impl HmacSha512 {
    pub fn new(secret: impl AsRef<[u8]>) -> Self {
        Self {
            key: hmac::Key::new(hmac::HMAC_SHA512, secret.as_ref()),
        }
    }
}

impl SignatureAlgorithm for HmacSha512 {
    fn name(&self) -> &str {
        "hmac-sha512"
    }

    fn sign(&self, data: &[u8], output: &mut dyn Write) -> std::io::Result<()> {
        output.write_all(hmac::sign(&self.key, data).as_ref())
    }

    fn verify(&self, data: &[u8], signature: &[u8]) -> bool {
        hmac::verify(&self.key, data, signature).is_ok()
    }
}

impl Debug for HmacSha512 {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HmacSha512").finish_non_exhaustive()
    }
}
