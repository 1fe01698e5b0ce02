// ── keedavault / settings ──────────────────────────────────────────────────────
//
// Store-wide settings, persisted as JSON. A missing file means defaults.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use keeda_core::{VaultError, VaultResult};
use keeda_storage::{default_app_data_dir, SafeSaveOptions, VaultFs, DEFAULT_MAX_RECENT};
use keeda_vault::{Cipher, Compression, CreateOptions, CryptoSettings, Kdf, RestoreFallback};

pub const SETTINGS_FILE_NAME: &str = "settings.json";

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct VaultSettings {
    /// Back up the existing file before every save
    pub backup_on_save: bool,
    /// Backups kept per vault
    pub max_backups: usize,
    /// Re-open the written file before replacing the original
    pub verify_after_write: bool,
    /// Save automatically after each mutation
    pub auto_save: bool,
    pub auto_save_debounce_ms: u64,
    pub max_recent_vaults: usize,
    pub default_cipher: Cipher,
    pub default_kdf: Kdf,
    pub default_compression: Compression,
    /// What restore does when the original group is gone
    pub restore_fallback: RestoreFallback,
    pub app_data_dir: PathBuf,
}

impl Default for VaultSettings {
    fn default() -> Self {
        Self {
            backup_on_save: true,
            max_backups: 2,
            verify_after_write: true,
            auto_save: true,
            auto_save_debounce_ms: 300,
            max_recent_vaults: DEFAULT_MAX_RECENT,
            default_cipher: Cipher::default(),
            default_kdf: Kdf::default(),
            default_compression: Compression::default(),
            restore_fallback: RestoreFallback::Root,
            app_data_dir: default_app_data_dir(),
        }
    }
}

impl VaultSettings {
    pub fn validate(&self) -> VaultResult<()> {
        if self.max_recent_vaults == 0 {
            return Err(VaultError::config("max_recent_vaults must be at least 1"));
        }
        if self.max_backups == 0 {
            return Err(VaultError::config("max_backups must be at least 1"));
        }
        self.default_kdf.validate()
    }

    pub fn safe_save_options(&self) -> SafeSaveOptions {
        SafeSaveOptions {
            create_backup: self.backup_on_save,
            max_backups: self.max_backups,
            verify_after_write: self.verify_after_write,
            app_data_dir: self.app_data_dir.clone(),
        }
    }

    pub fn create_options(&self) -> CreateOptions {
        CreateOptions {
            crypto: CryptoSettings {
                cipher: self.default_cipher,
                kdf: self.default_kdf,
                compression: self.default_compression,
            },
            ..Default::default()
        }
    }

    /// Load from `path`; defaults when the file does not exist.
    pub async fn load(fs: &dyn VaultFs, path: &Path) -> VaultResult<Self> {
        if !fs.exists(path).await {
            log::info!("No settings at {}, using defaults", path.display());
            return Ok(Self::default());
        }
        let bytes = fs.read(path).await?;
        let settings: Self = serde_json::from_slice(&bytes)
            .map_err(|e| VaultError::config(format!("Invalid settings file {}: {}", path.display(), e)))?;
        settings.validate()?;
        Ok(settings)
    }

    pub async fn save(&self, fs: &dyn VaultFs, path: &Path) -> VaultResult<()> {
        self.validate()?;
        if let Some(dir) = path.parent() {
            if !dir.as_os_str().is_empty() && !fs.exists(dir).await {
                fs.create_dir_all(dir).await?;
            }
        }
        let json = serde_json::to_vec_pretty(self)?;
        fs.write(path, &json).await
    }
}
