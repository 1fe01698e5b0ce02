//! # KeedaVault – Storage
//!
//! Durable persistence for encrypted vaults: an async filesystem seam,
//! cloud-sync path detection, timestamped backups with rotation, the
//! backup → temp write → verify → swap → rollback save protocol, and the
//! recent-vault registry.

pub mod fs;
pub mod paths;
pub mod backup;
pub mod safe_save;
pub mod recent;

pub use fs::{SharedFs, TokioFs, VaultFs};
pub use safe_save::{safe_save, safe_save_bytes, verify_vault_file, SafeSaveOptions, SafeSaveResult, SaveStep, StepStatus, VerifyDetails, VerifyReport};
pub use backup::{list_backups, restore_from_backup, BackupInfo, BackupLocation};
pub use recent::{RecentVault, RecentVaults, DEFAULT_MAX_RECENT};
pub use paths::{default_app_data_dir, hash_path, is_cloud_path};
