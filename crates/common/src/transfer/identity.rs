//! Remote host identity checks.
//!
//! The trust decision is an explicit, configured [`HostIdentityPolicy`]. There is
//! no implicit default: accepting unknown keys has to be spelled out as
//! `Unverified` in configuration.

use std::fmt;

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use serde::{Deserialize, Serialize};
use ssh2::HostKeyType;

/// Human-readable identity of a host key: `<algorithm> <base64 key blob>`.
///
/// Same shape as the key fields of an OpenSSH `known_hosts` line, so an operator
/// can copy it from a warning straight into a pinned policy.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct HostFingerprint(String);

impl HostFingerprint {
    pub fn new(algorithm: &str, key: &[u8]) -> Self {
        Self(format!("{} {}", algorithm, STANDARD.encode(key)))
    }

    /// Fingerprint a key as presented by an ssh2 session
    pub fn from_host_key(key: &[u8], kind: HostKeyType) -> Self {
        Self::new(algorithm_name(kind), key)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for HostFingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

fn algorithm_name(kind: HostKeyType) -> &'static str {
    match kind {
        HostKeyType::Rsa => "ssh-rsa",
        HostKeyType::Dss => "ssh-dss",
        HostKeyType::Ecdsa256 => "ecdsa-sha2-nistp256",
        HostKeyType::Ecdsa384 => "ecdsa-sha2-nistp384",
        HostKeyType::Ecdsa521 => "ecdsa-sha2-nistp521",
        HostKeyType::Ed25519 => "ssh-ed25519",
        _ => "unknown",
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("host key verification failed: expected {expected:?} but got {observed:?}")]
pub struct IdentityMismatch {
    pub expected: String,
    pub observed: String,
}

/// Outcome of an accepted identity check
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Verification {
    /// Presented key matched the pinned fingerprint
    Trusted,
    /// Policy accepts any key; carries what the host presented
    Unverified(HostFingerprint),
}

/// How the identity of the remote host is established.
///
/// Serialized as `policy = "unverified"` or
/// `policy = "pinned"` + `fingerprint = "ssh-ed25519 AAAA..."`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "policy", rename_all = "snake_case")]
pub enum HostIdentityPolicy {
    /// Accept every host key, warning with its fingerprint
    Unverified,
    /// Accept only this exact fingerprint
    Pinned { fingerprint: String },
}

impl HostIdentityPolicy {
    pub fn pinned(fingerprint: impl Into<String>) -> Self {
        Self::Pinned {
            fingerprint: fingerprint.into(),
        }
    }

    /// Decide whether `presented` may be trusted for this connection attempt.
    ///
    /// Pinned fingerprints are compared byte for byte; nothing is normalized.
    pub fn verify(&self, presented: &HostFingerprint) -> Result<Verification, IdentityMismatch> {
        match self {
            HostIdentityPolicy::Unverified => {
                tracing::warn!(
                    trusted_key = %presented,
                    "SSH host key verification is NOT in effect; pin this key to enable it"
                );
                Ok(Verification::Unverified(presented.clone()))
            }
            HostIdentityPolicy::Pinned { fingerprint } => {
                if fingerprint.as_bytes() == presented.as_str().as_bytes() {
                    Ok(Verification::Trusted)
                } else {
                    tracing::error!(
                        expected = %fingerprint,
                        got = %presented,
                        "SSH host key verification error"
                    );
                    Err(IdentityMismatch {
                        expected: fingerprint.clone(),
                        observed: presented.to_string(),
                    })
                }
            }
        }
    }
}

impl fmt::Display for HostIdentityPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            HostIdentityPolicy::Unverified => write!(f, "unverified (any host key accepted)"),
            HostIdentityPolicy::Pinned { fingerprint } => write!(f, "pinned ({})", fingerprint),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const KEY_A: &[u8] = b"\x00\x00\x00\x0bssh-ed25519\x00\x00\x00\x20aaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaa";
    const KEY_B: &[u8] = b"\x00\x00\x00\x0bssh-ed25519\x00\x00\x00\x20bbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbb";

    #[test]
    fn test_fingerprint_format() {
        let fp = HostFingerprint::from_host_key(b"key-bytes", HostKeyType::Ed25519);
        assert_eq!(fp.as_str(), "ssh-ed25519 a2V5LWJ5dGVz");

        let fp = HostFingerprint::from_host_key(b"key-bytes", HostKeyType::Ecdsa256);
        assert!(fp.as_str().starts_with("ecdsa-sha2-nistp256 "));
    }

    #[test]
    fn test_unverified_accepts_and_reports_key() {
        let presented = HostFingerprint::from_host_key(KEY_A, HostKeyType::Ed25519);
        let outcome = HostIdentityPolicy::Unverified.verify(&presented).unwrap();
        assert_eq!(outcome, Verification::Unverified(presented));
    }

    #[test]
    fn test_pinned_match_is_trusted() {
        let presented = HostFingerprint::from_host_key(KEY_A, HostKeyType::Ed25519);
        let policy = HostIdentityPolicy::pinned(presented.to_string());
        assert_eq!(policy.verify(&presented).unwrap(), Verification::Trusted);
    }

    #[test]
    fn test_pinned_mismatch_carries_both_values() {
        let expected = HostFingerprint::from_host_key(KEY_A, HostKeyType::Ed25519);
        let presented = HostFingerprint::from_host_key(KEY_B, HostKeyType::Ed25519);
        let policy = HostIdentityPolicy::pinned(expected.to_string());

        let err = policy.verify(&presented).unwrap_err();
        assert_eq!(err.expected, expected.to_string());
        assert_eq!(err.observed, presented.to_string());

        let message = err.to_string();
        assert!(message.contains(expected.as_str()));
        assert!(message.contains(presented.as_str()));
    }

    #[test]
    fn test_pinned_is_not_normalized() {
        let presented = HostFingerprint::from_host_key(KEY_A, HostKeyType::Ed25519);
        let policy = HostIdentityPolicy::pinned(format!(" {}\n", presented));
        assert!(policy.verify(&presented).is_err());
    }

    #[test]
    fn test_same_key_different_algorithm_rejected() {
        let expected = HostFingerprint::from_host_key(KEY_A, HostKeyType::Rsa);
        let presented = HostFingerprint::from_host_key(KEY_A, HostKeyType::Ed25519);
        let policy = HostIdentityPolicy::pinned(expected.to_string());
        assert!(policy.verify(&presented).is_err());
    }
}
