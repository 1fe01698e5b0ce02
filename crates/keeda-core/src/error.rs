//! Vault-wide error type.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Categorised vault error.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VaultError {
    pub kind: VaultErrorKind,
    pub message: String,
    /// Number of items blocking the operation (set for `GroupNotEmpty`).
    pub count: Option<usize>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum VaultErrorKind {
    /// Wrong credentials or a corrupt container header.
    DecryptError,
    /// A mutation referenced a group or entry that does not exist.
    InvalidTarget,
    /// Group deletion blocked by entries somewhere in its subtree.
    GroupNotEmpty,
    /// The freshly written file could not be re-opened.
    VerificationFailed,
    /// The original group of a recycled entry no longer exists.
    RestoreTargetMissing,
    /// The operation is structurally forbidden (root deletion, cycles, ...).
    InvalidOperation,
    /// Unknown magic, version, cipher or KDF identifier.
    UnsupportedFormat,
    /// Key derivation or sealing failure.
    Crypto,
    /// Local filesystem failure.
    Io,
    /// Payload or settings (de)serialization failure.
    Serialization,
    /// No open vault with the given id.
    VaultNotFound,
    /// Invalid settings or parameters.
    Config,
}

pub type VaultResult<T> = Result<T, VaultError>;

// ── Construction helpers ─────────────────────────────────────────────

impl VaultError {
    pub fn new(kind: VaultErrorKind, msg: impl Into<String>) -> Self {
        Self {
            kind,
            message: msg.into(),
            count: None,
        }
    }

    pub fn with_count(mut self, count: usize) -> Self {
        self.count = Some(count);
        self
    }

    pub fn is(&self, kind: VaultErrorKind) -> bool {
        self.kind == kind
    }

    // ── Convenience constructors ─────────────────────────────────

    pub fn decrypt(msg: impl Into<String>) -> Self {
        Self::new(VaultErrorKind::DecryptError, msg)
    }

    pub fn invalid_target(msg: impl Into<String>) -> Self {
        Self::new(VaultErrorKind::InvalidTarget, msg)
    }

    pub fn group_not_found(uuid: impl fmt::Display) -> Self {
        Self::invalid_target(format!("Group not found: {}", uuid))
    }

    pub fn entry_not_found(uuid: impl fmt::Display) -> Self {
        Self::invalid_target(format!("Entry not found: {}", uuid))
    }

    pub fn group_not_empty(count: usize) -> Self {
        Self::new(
            VaultErrorKind::GroupNotEmpty,
            format!("Group contains {} items", count),
        )
        .with_count(count)
    }

    pub fn verification_failed(msg: impl Into<String>) -> Self {
        Self::new(VaultErrorKind::VerificationFailed, msg)
    }

    pub fn restore_target_missing(msg: impl Into<String>) -> Self {
        Self::new(VaultErrorKind::RestoreTargetMissing, msg)
    }

    pub fn invalid_operation(msg: impl Into<String>) -> Self {
        Self::new(VaultErrorKind::InvalidOperation, msg)
    }

    pub fn unsupported(msg: impl Into<String>) -> Self {
        Self::new(VaultErrorKind::UnsupportedFormat, msg)
    }

    pub fn crypto(msg: impl Into<String>) -> Self {
        Self::new(VaultErrorKind::Crypto, msg)
    }

    pub fn io(msg: impl Into<String>) -> Self {
        Self::new(VaultErrorKind::Io, msg)
    }

    pub fn serialization(msg: impl Into<String>) -> Self {
        Self::new(VaultErrorKind::Serialization, msg)
    }

    pub fn vault_not_found(id: &str) -> Self {
        Self::new(VaultErrorKind::VaultNotFound, format!("Vault not found: {}", id))
    }

    pub fn config(msg: impl Into<String>) -> Self {
        Self::new(VaultErrorKind::Config, msg)
    }
}

impl fmt::Display for VaultError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[Vault {:?}] {}", self.kind, self.message)
    }
}

impl std::error::Error for VaultError {}

impl From<std::io::Error> for VaultError {
    fn from(e: std::io::Error) -> Self {
        Self::io(e.to_string())
    }
}

impl From<serde_json::Error> for VaultError {
    fn from(e: serde_json::Error) -> Self {
        Self::serialization(e.to_string())
    }
}

impl From<VaultError> for String {
    fn from(e: VaultError) -> String {
        e.message
    }
}
