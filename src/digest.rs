//! SHA256 digest utilities for registry content
//!
//! Computing and validating `sha256:<hex>` content digests, and deriving the
//! digest key under which immutable registry responses are cached.

use regex::Regex;
use reqwest::Method;
use sha2::Digest;
use std::sync::LazyLock;

/// Digest prefix used by registries for SHA256 content
pub const SHA256_PREFIX: &str = "sha256:";

static DIGEST_KEY_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(blobs|manifests)/sha256:[a-f0-9]+$").expect("valid digest key pattern"));

/// Utilities for working with SHA256 digests in registry context
pub struct DigestUtils;

impl DigestUtils {
    /// Compute SHA256 digest from byte data
    pub fn compute_sha256(data: &[u8]) -> String {
        let mut hasher = sha2::Sha256::new();
        hasher.update(data);
        hex::encode(hasher.finalize())
    }

    /// Compute full registry digest (with sha256: prefix) from byte data
    pub fn compute_docker_digest(data: &[u8]) -> String {
        format!("{}{}", SHA256_PREFIX, Self::compute_sha256(data))
    }

    /// Validate SHA256 hex string (64 characters, all hex)
    pub fn is_valid_sha256_hex(digest: &str) -> bool {
        digest.len() == 64 && digest.chars().all(|c| c.is_ascii_hexdigit())
    }

    /// Validate full digest format (sha256:xxxxx)
    pub fn is_valid_docker_digest(digest: &str) -> bool {
        digest
            .strip_prefix(SHA256_PREFIX)
            .is_some_and(Self::is_valid_sha256_hex)
    }

    /// Cache key for a request, e.g. `manifests/sha256:ab12...`.
    ///
    /// Only GET requests whose path ends in a blob or manifest digest are
    /// addressed by content and therefore cacheable.
    pub fn digest_key(method: &Method, url: &str) -> Option<String> {
        if *method != Method::GET {
            return None;
        }
        let path = url.split(['?', '#']).next().unwrap_or(url);
        DIGEST_KEY_REGEX
            .find(path)
            .map(|matched| matched.as_str().to_string())
    }

    /// Shortened digest for display, `sha256:0123456789ab`
    pub fn short(digest: &str) -> &str {
        let end = SHA256_PREFIX.len() + 12;
        if digest.starts_with(SHA256_PREFIX) && digest.len() > end {
            &digest[..end]
        } else {
            digest
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const HELLO_DIGEST: &str = "b94d27b9934d3e08a52e52d7da7dabfac484efe37a5380ee9088f7ace2efcde9";

    #[test]
    fn test_compute_sha256() {
        let digest = DigestUtils::compute_sha256(b"hello world");
        assert_eq!(digest, HELLO_DIGEST);
    }

    #[test]
    fn test_compute_docker_digest_is_deterministic() {
        let first = DigestUtils::compute_docker_digest(b"hello world");
        let second = DigestUtils::compute_docker_digest(b"hello world");
        assert_eq!(first, second);
        assert_eq!(first, format!("sha256:{}", HELLO_DIGEST));

        let hex_part = first.strip_prefix("sha256:").unwrap();
        assert_eq!(hex_part.len(), 64);
        assert!(hex_part.chars().all(|c| c.is_ascii_digit() || ('a'..='f').contains(&c)));
    }

    #[test]
    fn test_validate_digest() {
        assert!(DigestUtils::is_valid_docker_digest(&format!("sha256:{}", HELLO_DIGEST)));
        assert!(!DigestUtils::is_valid_docker_digest("sha256:invalid"));
        assert!(!DigestUtils::is_valid_docker_digest(HELLO_DIGEST));
    }

    #[test]
    fn test_digest_key_for_blobs_and_manifests() {
        let blob = format!("http://registry:5000/v2/library/alpine/blobs/sha256:{}", HELLO_DIGEST);
        assert_eq!(
            DigestUtils::digest_key(&Method::GET, &blob),
            Some(format!("blobs/sha256:{}", HELLO_DIGEST))
        );

        let manifest = format!("http://registry:5000/v2/app/manifests/sha256:{}", HELLO_DIGEST);
        assert_eq!(
            DigestUtils::digest_key(&Method::GET, &manifest),
            Some(format!("manifests/sha256:{}", HELLO_DIGEST))
        );
    }

    #[test]
    fn test_digest_key_rejects_non_cacheable_requests() {
        let blob = format!("http://registry:5000/v2/app/blobs/sha256:{}", HELLO_DIGEST);
        assert_eq!(DigestUtils::digest_key(&Method::HEAD, &blob), None);
        assert_eq!(DigestUtils::digest_key(&Method::DELETE, &blob), None);

        assert_eq!(
            DigestUtils::digest_key(&Method::GET, "http://registry:5000/v2/app/manifests/latest"),
            None
        );
        assert_eq!(
            DigestUtils::digest_key(&Method::GET, "http://registry:5000/v2/_catalog?n=10"),
            None
        );
        assert_eq!(
            DigestUtils::digest_key(&Method::GET, "http://registry:5000/v2/app/manifests/sha256:ABCDEF"),
            None
        );
    }

    #[test]
    fn test_short_digest() {
        let full = format!("sha256:{}", HELLO_DIGEST);
        assert_eq!(DigestUtils::short(&full), "sha256:b94d27b9934d");
        assert_eq!(DigestUtils::short("latest"), "latest");
    }
}
