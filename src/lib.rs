//! # KeedaVault
//!
//! Encrypted, hierarchical credential vaults. This crate ties the pieces
//! together:
//!
//! * [`VaultStore`] owns every unlocked vault, applies [`VaultCommand`]s and
//!   answers tree, smart-view and search queries.
//! * Saves go through the backup → temp write → verify → replace protocol of
//!   `keeda-storage`, debounced after mutations.
//! * [`VaultEvent`]s are broadcast for lifecycle, mutation and save outcomes.
//! * [`VaultSettings`] and [`init_logging`] cover configuration and logging.

pub mod command;
pub mod events;
pub mod logging;
pub mod saver;
pub mod settings;
pub mod store;

pub use command::{apply, CommandOutcome, VaultCommand};
pub use events::{EventBus, VaultEvent};
pub use logging::{init_logging, LoggingConfig};
pub use settings::VaultSettings;
pub use store::{VaultId, VaultInfo, VaultState, VaultStore, VaultStoreState};

pub use keeda_core::{Clock, ManualClock, SharedClock, SystemClock, VaultError, VaultErrorKind, VaultResult};
pub use keeda_storage::{
    BackupInfo, RecentVault, SafeSaveOptions, SafeSaveResult, SaveStep, SharedFs, StepStatus, TokioFs, VaultFs,
    VerifyReport,
};
pub use keeda_vault::{
    Cipher, Compression, Credentials, DeletionKind, EntryForm, GroupInfo, GroupUpdate, ImportFormat, ImportResult,
    Kdf, KeyFileChange, PropertiesUpdate, RestoreFallback, RestoreOutcome, SmartView, VaultEntry, VaultGroup,
    VaultProperties,
};

use std::path::Path;
use std::sync::Arc;

/// Build a store on the real filesystem, loading settings from
/// `{app_data}/settings.json` when present.
pub async fn open_store(app_data: &Path) -> VaultResult<VaultStoreState> {
    let fs = TokioFs::shared();
    let settings_path = app_data.join(settings::SETTINGS_FILE_NAME);
    let mut settings = VaultSettings::load(&*fs, &settings_path).await?;
    settings.app_data_dir = app_data.to_path_buf();
    VaultStore::new(settings, fs, Arc::new(SystemClock)).await
}
