// ── keeda-vault / vault module ─────────────────────────────────────────────────
//
// Encrypted credential vault engine providing:
//   • Arena + index document model (groups and entries keyed by UUID)
//   • Typed cipher / KDF parameters with native dictionary conversion
//   • Sealed container format (Argon2 / AES-KDF, AES-256-GCM / ChaCha20-Poly1305)
//   • Immutable tree projection for consumers
//   • Group and entry mutations with recycle-bin soft delete and restore
//   • Append-only entry history
//   • OTP URL generation and normalisation
//   • Vault properties and master-key changes
//   • Smart views (websites, 2FA, notes, duplicated passwords) and search
//   • Import from other managers' exports and from vault files; CSV and vault export

pub mod types;
pub mod params;
pub mod crypto;
pub mod document;
pub mod container;
pub mod projection;
pub mod groups;
pub mod entries;
pub mod otp;
pub mod views;
pub mod properties;
pub mod import_export;

pub use types::*;
pub use params::{Cipher, Compression, Kdf, KdfParameters, VariantValue};
pub use crypto::{Credentials, KeyFileChange};
pub use document::{CustomField, DocumentMeta, EntryNode, EntrySnapshot, GroupNode, Times, VaultDocument};
pub use container::{Container, CreateOptions, CryptoSettings, SealedContainer};
pub use projection::project;
pub use views::SmartView;
pub use properties::{change_credentials, properties, update_properties};
pub use import_export::{
    entries_to_csv, entries_to_vault, parse_import, parse_vault_entries, select_entries, ImportFormat, ImportResult,
};
