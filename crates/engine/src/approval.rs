//! Approval authority: verifies an approver's PIN before any state write.
//!
//! PINs are never stored in clear. The credential store holds the SHA-256
//! digest of each (role, name) pair's PIN and the authority compares digests
//! in constant time. An unknown approver and a wrong PIN produce the same
//! `false`, after the same amount of work.

use std::collections::BTreeMap;
use std::sync::Arc;

use async_trait::async_trait;
use logbook_storage::{ApproverRole, StorageError};
use sha2::{Digest, Sha256};
use subtle::ConstantTimeEq;

/// SHA-256 digest of a PIN.
pub type PinDigest = [u8; 32];

/// Compared against when the approver is unknown, so both failure paths run
/// the same comparison.
const UNKNOWN_APPROVER_DIGEST: PinDigest = [0u8; 32];

pub fn digest_pin(pin: &str) -> PinDigest {
    Sha256::digest(pin.as_bytes()).into()
}

/// Lowercase hex rendering of a digest.
pub fn digest_to_hex(digest: &PinDigest) -> String {
    digest.iter().map(|b| format!("{:02x}", b)).collect()
}

/// Parse a 64-character hex digest.
pub fn parse_hex_digest(hex: &str) -> Result<PinDigest, String> {
    let hex = hex.trim();
    if hex.len() != 64 || !hex.is_ascii() {
        return Err(format!(
            "expected 64 hex characters, got {} characters",
            hex.chars().count()
        ));
    }
    let mut out = [0u8; 32];
    for (i, byte) in out.iter_mut().enumerate() {
        *byte = u8::from_str_radix(&hex[i * 2..i * 2 + 2], 16)
            .map_err(|e| format!("invalid hex at offset {}: {}", i * 2, e))?;
    }
    Ok(out)
}

/// Lookup of approver PIN digests, keyed by (role, name).
#[async_trait]
pub trait CredentialStore: Send + Sync + 'static {
    /// The PIN digest bound to this approver, or `None` if unknown.
    async fn pin_digest(
        &self,
        role: ApproverRole,
        name: &str,
    ) -> Result<Option<PinDigest>, StorageError>;
}

/// In-memory credential store.
#[derive(Debug, Clone, Default)]
pub struct MemoryCredentials {
    entries: Arc<BTreeMap<(ApproverRole, String), PinDigest>>,
}

impl MemoryCredentials {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder: bind a clear-text PIN (stored as its digest).
    pub fn with_pin(self, role: ApproverRole, name: &str, pin: &str) -> Self {
        self.with_digest(role, name, digest_pin(pin))
    }

    /// Builder: bind an already-computed digest.
    pub fn with_digest(self, role: ApproverRole, name: &str, digest: PinDigest) -> Self {
        let mut entries = Arc::unwrap_or_clone(self.entries);
        entries.insert((role, name.to_string()), digest);
        Self {
            entries: Arc::new(entries),
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[async_trait]
impl CredentialStore for MemoryCredentials {
    async fn pin_digest(
        &self,
        role: ApproverRole,
        name: &str,
    ) -> Result<Option<PinDigest>, StorageError> {
        Ok(self.entries.get(&(role, name.to_string())).copied())
    }
}

/// Validates (role, name, PIN) triples against a [`CredentialStore`].
#[derive(Debug, Clone)]
pub struct ApprovalAuthority<K> {
    credentials: K,
}

impl<K: CredentialStore> ApprovalAuthority<K> {
    pub fn new(credentials: K) -> Self {
        Self { credentials }
    }

    pub fn credentials(&self) -> &K {
        &self.credentials
    }

    /// Returns `true` only if the approver exists and the PIN matches.
    ///
    /// Never fails: unknown approvers, wrong PINs, and credential-store
    /// errors all yield `false`.
    pub async fn verify(&self, role: ApproverRole, declared_name: &str, supplied_pin: &str) -> bool {
        let supplied = digest_pin(supplied_pin);
        let stored = match self.credentials.pin_digest(role, declared_name).await {
            Ok(stored) => stored,
            Err(e) => {
                tracing::error!(error = %e, "credential lookup failed");
                None
            }
        };

        let known = stored.is_some();
        let expected = stored.unwrap_or(UNKNOWN_APPROVER_DIGEST);
        let pin_matches: bool = supplied[..].ct_eq(&expected[..]).into();
        let verified = known & pin_matches;

        if !verified {
            tracing::warn!(role = %role, "approver verification failed");
        }
        verified
    }
}
