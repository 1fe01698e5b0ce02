// ── keeda-vault / types ────────────────────────────────────────────────────────
//
// Projection snapshots, mutation requests and operation results.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::collections::BTreeMap;
use std::fmt;
use uuid::Uuid;
use zeroize::Zeroizing;

use super::params::{Cipher, Compression, Kdf};

// ─── Protected Values ─────────────────────────────────────────────────────────

/// A secret string that is wiped from memory on drop and never printed.
#[derive(Clone, Default)]
pub struct ProtectedString(Zeroizing<String>);

impl ProtectedString {
    pub fn new(value: impl Into<String>) -> Self {
        Self(Zeroizing::new(value.into()))
    }

    /// Borrow the plain text. Keep the borrow as short as possible.
    pub fn expose(&self) -> &str {
        self.0.as_str()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl PartialEq for ProtectedString {
    fn eq(&self, other: &Self) -> bool {
        self.expose() == other.expose()
    }
}

impl Eq for ProtectedString {}

impl fmt::Debug for ProtectedString {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("ProtectedString(***)")
    }
}

impl From<&str> for ProtectedString {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

impl From<String> for ProtectedString {
    fn from(value: String) -> Self {
        Self::new(value)
    }
}

impl Serialize for ProtectedString {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.expose())
    }
}

impl<'de> Deserialize<'de> for ProtectedString {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        String::deserialize(deserializer).map(Self::new)
    }
}

// ─── Well-known Names ─────────────────────────────────────────────────────────

pub const FIELD_TITLE: &str = "Title";
pub const FIELD_USERNAME: &str = "UserName";
pub const FIELD_PASSWORD: &str = "Password";
pub const FIELD_URL: &str = "URL";
pub const FIELD_NOTES: &str = "Notes";
pub const FIELD_OTP: &str = "otp";
pub const FIELD_EMAIL: &str = "Email";

/// Fields backing the standard entry properties; never shown as custom fields.
pub const STANDARD_FIELDS: [&str; 7] = [
    FIELD_TITLE,
    FIELD_USERNAME,
    FIELD_PASSWORD,
    FIELD_URL,
    FIELD_NOTES,
    FIELD_OTP,
    FIELD_EMAIL,
];

/// Field recording the group a recycled entry came from.
pub const ORIGINAL_GROUP_FIELD: &str = "KeedaVault_OriginalGroup";

/// Group custom-data key holding the `allow_add` policy.
pub const ALLOW_ADD_KEY: &str = "keedavault_allow_add";

pub const DEFAULT_GROUP_ICON: u32 = 48;
pub const DEFAULT_ENTRY_ICON: u32 = 0;
pub const RECYCLE_BIN_ICON: u32 = 43;
pub const RECYCLE_BIN_NAME: &str = "Recycle Bin";

/// Groups seeded into every newly created vault.
pub const DEFAULT_GROUPS: [&str; 6] = [
    "General",
    "Windows",
    "Network",
    "Internet",
    "eMail",
    "Homebanking",
];

/// Whether a field name is owned by the engine rather than the user.
pub fn is_reserved_field(key: &str) -> bool {
    STANDARD_FIELDS.contains(&key) || key == ORIGINAL_GROUP_FIELD
}

// ─── Projection Types ─────────────────────────────────────────────────────────

/// Immutable snapshot of a group and its subtree.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct VaultGroup {
    pub uuid: Uuid,
    pub name: String,
    pub icon: u32,
    pub entries: Vec<VaultEntry>,
    pub subgroups: Vec<VaultGroup>,
    pub is_recycle_bin: bool,
    /// Whether new entries may be created here
    pub allow_add: bool,
    pub enable_searching: Option<bool>,
}

impl VaultGroup {
    /// Find a group anywhere in this subtree.
    pub fn find_group(&self, uuid: &Uuid) -> Option<&VaultGroup> {
        if &self.uuid == uuid {
            return Some(self);
        }
        self.subgroups.iter().find_map(|g| g.find_group(uuid))
    }

    /// Find an entry anywhere in this subtree.
    pub fn find_entry(&self, uuid: &Uuid) -> Option<&VaultEntry> {
        self.entries
            .iter()
            .find(|e| &e.uuid == uuid)
            .or_else(|| self.subgroups.iter().find_map(|g| g.find_entry(uuid)))
    }

    /// Recursive entry count.
    pub fn count_entries(&self) -> usize {
        self.entries.len() + self.subgroups.iter().map(|g| g.count_entries()).sum::<usize>()
    }

    /// Depth-first flattening of every entry in this subtree.
    pub fn all_entries(&self) -> Vec<&VaultEntry> {
        let mut out: Vec<&VaultEntry> = self.entries.iter().collect();
        for sub in &self.subgroups {
            out.extend(sub.all_entries());
        }
        out
    }
}

/// Immutable snapshot of an entry.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct VaultEntry {
    pub uuid: Uuid,
    pub group_uuid: Uuid,
    pub title: String,
    pub username: String,
    pub email: Option<String>,
    pub password: ProtectedString,
    pub url: String,
    pub notes: String,
    pub icon: u32,
    /// Custom fields only; standard and engine fields are excluded
    pub fields: BTreeMap<String, String>,
    pub tags: Vec<String>,
    pub creation_time: DateTime<Utc>,
    pub last_mod_time: DateTime<Utc>,
    pub otp_url: Option<String>,
    pub expiry_time: Option<DateTime<Utc>>,
    pub attachments: Vec<Attachment>,
    /// Prior versions, oldest first (never nested)
    pub history: Vec<VaultEntry>,
}

/// A named binary attachment.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Attachment {
    pub name: String,
    pub data: Vec<u8>,
}

// ─── Requests ─────────────────────────────────────────────────────────────────

/// Data for creating or editing an entry.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct EntryForm {
    /// Destination group
    pub group_uuid: Uuid,
    pub title: String,
    pub username: String,
    pub email: String,
    pub password: ProtectedString,
    pub url: String,
    pub notes: String,
    /// Raw Base32 TOTP secret; invalid secrets are ignored
    pub totp_secret: String,
    pub expiry_time: Option<DateTime<Utc>>,
    pub custom_fields: Option<BTreeMap<String, String>>,
    /// When set on update, replaces every existing attachment
    pub attachments: Option<Vec<Attachment>>,
    pub icon_id: Option<u32>,
    pub tags: Option<Vec<String>>,
}

impl EntryForm {
    pub fn new(group_uuid: Uuid, title: impl Into<String>) -> Self {
        Self {
            group_uuid,
            title: title.into(),
            ..Default::default()
        }
    }

    pub fn username(mut self, username: impl Into<String>) -> Self {
        self.username = username.into();
        self
    }

    pub fn password(mut self, password: impl Into<ProtectedString>) -> Self {
        self.password = password.into();
        self
    }

    pub fn url(mut self, url: impl Into<String>) -> Self {
        self.url = url.into();
        self
    }

    pub fn notes(mut self, notes: impl Into<String>) -> Self {
        self.notes = notes.into();
        self
    }

    pub fn email(mut self, email: impl Into<String>) -> Self {
        self.email = email.into();
        self
    }

    pub fn totp_secret(mut self, secret: impl Into<String>) -> Self {
        self.totp_secret = secret.into();
        self
    }
}

/// Group edit request. `parent_uuid` re-parents when it differs from the
/// current parent.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GroupUpdate {
    pub name: String,
    pub icon_id: Option<u32>,
    pub parent_uuid: Option<Uuid>,
    pub allow_add: Option<bool>,
}

/// Vault-level metadata edit.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PropertiesUpdate {
    pub name: Option<String>,
    pub description: Option<String>,
    pub cipher: Option<Cipher>,
    pub kdf: Option<Kdf>,
    pub compression: Option<Compression>,
    pub recycle_bin_enabled: Option<bool>,
}

// ─── Results ──────────────────────────────────────────────────────────────────

/// What `delete_entry` will do (or did) to an entry.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum DeletionKind {
    /// Soft delete: the entry moves into the recycle bin
    MoveToRecycleBin,
    /// The entry is already recycled and will be purged
    Permanent,
}

/// Policy when a recycled entry's original group has disappeared.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
pub enum RestoreFallback {
    /// Restore into the root group
    #[default]
    Root,
    /// Fail with `RestoreTargetMissing`
    Fail,
}

/// Where a restored entry ended up.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct RestoreOutcome {
    pub group_uuid: Uuid,
    pub group_name: String,
    pub group_icon: u32,
    pub fell_back_to_root: bool,
}

/// Display information about a group.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct GroupInfo {
    pub uuid: Uuid,
    pub name: String,
    pub icon: u32,
}

/// Outcome of moving several entries at once.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct BulkMoveResult {
    pub moved: usize,
    pub failed: Vec<Uuid>,
}

/// Vault metadata and crypto configuration.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct VaultProperties {
    pub name: String,
    pub description: String,
    pub cipher: Cipher,
    pub kdf: Kdf,
    pub compression: Compression,
    pub recycle_bin_enabled: bool,
    pub entry_count: usize,
    pub group_count: usize,
    pub created: DateTime<Utc>,
}
