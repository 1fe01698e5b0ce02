// ── keeda-storage / recent ─────────────────────────────────────────────────────
//
// Most-recent-first list of opened vaults, persisted as JSON under the app
// data directory.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use keeda_core::VaultResult;

use crate::fs::VaultFs;

pub const RECENT_FILE_NAME: &str = "recent_vaults.json";
pub const DEFAULT_MAX_RECENT: usize = 5;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RecentVault {
    /// `None` for vaults opened from bytes
    pub path: Option<String>,
    pub filename: String,
    /// Epoch milliseconds
    pub last_opened: i64,
}

impl RecentVault {
    fn same_vault(&self, path: Option<&str>, filename: &str) -> bool {
        self.path.as_deref() == path && self.filename == filename
    }
}

#[derive(Debug, Clone)]
pub struct RecentVaults {
    file: PathBuf,
    max: usize,
    items: Vec<RecentVault>,
}

impl RecentVaults {
    pub fn new(app_data: &Path, max: usize) -> Self {
        Self {
            file: app_data.join(RECENT_FILE_NAME),
            max,
            items: Vec::new(),
        }
    }

    /// Read the persisted list. A missing or unreadable file yields an empty
    /// registry.
    pub async fn load(fs: &dyn VaultFs, app_data: &Path, max: usize) -> Self {
        let mut registry = Self::new(app_data, max);
        if !fs.exists(&registry.file).await {
            return registry;
        }
        match fs.read(&registry.file).await {
            Ok(bytes) => match serde_json::from_slice::<Vec<RecentVault>>(&bytes) {
                Ok(mut items) => {
                    items.truncate(max);
                    registry.items = items;
                }
                Err(e) => log::warn!("Ignoring malformed {}: {}", registry.file.display(), e),
            },
            Err(e) => log::warn!("Failed to read recent vaults: {}", e),
        }
        registry
    }

    pub async fn save(&self, fs: &dyn VaultFs) -> VaultResult<()> {
        if let Some(dir) = self.file.parent() {
            if !fs.exists(dir).await {
                fs.create_dir_all(dir).await?;
            }
        }
        let json = serde_json::to_vec_pretty(&self.items)?;
        fs.write(&self.file, &json).await
    }

    pub fn items(&self) -> &[RecentVault] {
        &self.items
    }

    /// Move (or insert) a vault to the front.
    pub fn record(&mut self, path: Option<&str>, filename: &str, at: DateTime<Utc>) {
        self.items.retain(|v| !v.same_vault(path, filename));
        self.items.insert(
            0,
            RecentVault {
                path: path.map(str::to_string),
                filename: filename.to_string(),
                last_opened: at.timestamp_millis(),
            },
        );
        self.items.truncate(self.max);
    }

    pub fn remove(&mut self, path: Option<&str>, filename: &str) -> bool {
        let before = self.items.len();
        self.items.retain(|v| !v.same_vault(path, filename));
        self.items.len() != before
    }

    pub fn clear(&mut self) {
        self.items.clear();
    }
}
