// ── keedavault / store ─────────────────────────────────────────────────────────
//
// Central coordination layer: owns every open vault, applies commands,
// answers queries over the projected tree and tracks the recent-vault list.
// Saving and auto-save scheduling live in `saver.rs`.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::{broadcast, Mutex, RwLock};
use uuid::Uuid;

use keeda_core::{SharedClock, VaultError, VaultResult};
use keeda_storage::{
    list_backups, restore_from_backup, safe_save_bytes, verify_vault_file, BackupInfo, RecentVault, RecentVaults,
    SafeSaveResult, SharedFs, VerifyReport,
};
use keeda_vault::{
    change_credentials, entries_to_csv, entries_to_vault, parse_import, parse_vault_entries, project, properties,
    select_entries, views, Container, Credentials, DeletionKind, EntryForm, GroupInfo, ImportFormat, ImportResult,
    KeyFileChange, SealedContainer, SmartView, VaultEntry, VaultGroup, VaultProperties,
};

use crate::command::{apply, is_noop, CommandOutcome, VaultCommand};
use crate::events::{EventBus, VaultEvent};
use crate::settings::{VaultSettings, SETTINGS_FILE_NAME};

pub type VaultId = String;

/// Shared handle to the store.
pub type VaultStoreState = Arc<VaultStore>;

/// One unlocked vault session.
pub struct VaultState {
    pub id: VaultId,
    /// Display name; the file name without extension when opened from disk
    pub name: String,
    pub filename: String,
    /// `None` for vaults opened from bytes that were never saved to disk
    pub path: Option<PathBuf>,
    pub(crate) container: SealedContainer,
    /// Bumped on every applied mutation
    pub(crate) revision: u64,
    /// Last revision written to disk
    pub(crate) saved_revision: u64,
}

impl VaultState {
    fn info(&self) -> VaultInfo {
        let doc = self.container.document();
        VaultInfo {
            id: self.id.clone(),
            name: self.name.clone(),
            filename: self.filename.clone(),
            path: self.path.clone(),
            revision: self.revision,
            dirty: self.is_dirty(),
            entry_count: doc.entry_count(),
            group_count: doc.group_count(),
        }
    }

    pub fn is_dirty(&self) -> bool {
        self.revision > self.saved_revision
    }
}

/// Summary of an open vault.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct VaultInfo {
    pub id: VaultId,
    pub name: String,
    pub filename: String,
    pub path: Option<PathBuf>,
    pub revision: u64,
    pub dirty: bool,
    pub entry_count: usize,
    pub group_count: usize,
}

pub struct VaultStore {
    pub(crate) vaults: Mutex<HashMap<VaultId, VaultState>>,
    recent: Mutex<RecentVaults>,
    pub(crate) settings: RwLock<VaultSettings>,
    pub(crate) fs: SharedFs,
    pub(crate) clock: SharedClock,
    pub(crate) events: EventBus,
    /// Serializes saves per vault
    pub(crate) save_gates: Mutex<HashMap<VaultId, Arc<Mutex<()>>>>,
    /// Latest auto-save request per vault; older timers give way
    pub(crate) auto_save_generation: Mutex<HashMap<VaultId, u64>>,
}

fn display_name(path: &Path) -> String {
    path.file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "Vault".to_string())
}

fn file_name(path: &Path) -> String {
    path.file_name()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default()
}

impl VaultStore {
    pub async fn new(settings: VaultSettings, fs: SharedFs, clock: SharedClock) -> VaultResult<VaultStoreState> {
        settings.validate()?;
        let recent = RecentVaults::load(&*fs, &settings.app_data_dir, settings.max_recent_vaults).await;
        log::info!(
            "Vault store ready (app data: {}, {} recent vaults)",
            settings.app_data_dir.display(),
            recent.items().len()
        );
        Ok(Arc::new(Self {
            vaults: Mutex::new(HashMap::new()),
            recent: Mutex::new(recent),
            settings: RwLock::new(settings),
            fs,
            clock,
            events: EventBus::new(),
            save_gates: Mutex::new(HashMap::new()),
            auto_save_generation: Mutex::new(HashMap::new()),
        }))
    }

    pub fn subscribe(&self) -> broadcast::Receiver<VaultEvent> {
        self.events.subscribe()
    }

    // ─── Settings ─────────────────────────────────────────────────────

    pub async fn settings(&self) -> VaultSettings {
        self.settings.read().await.clone()
    }

    /// Replace the settings and persist them under the app data directory.
    pub async fn update_settings(&self, settings: VaultSettings) -> VaultResult<()> {
        settings.validate()?;
        settings
            .save(&*self.fs, &settings.app_data_dir.join(SETTINGS_FILE_NAME))
            .await?;
        *self.settings.write().await = settings;
        log::info!("Vault settings updated");
        Ok(())
    }

    // ─── Lifecycle ────────────────────────────────────────────────────

    /// Create a new vault. With a path it is written to disk immediately.
    pub async fn create_vault(
        self: &Arc<Self>,
        name: &str,
        credentials: Credentials,
        path: Option<PathBuf>,
    ) -> VaultResult<VaultInfo> {
        let options = self.settings.read().await.create_options();
        let container = SealedContainer::create(name, Arc::new(credentials), &options)?;
        let filename = path.as_deref().map(file_name).unwrap_or_else(|| format!("{}.kdvx", name));
        let id = self
            .register(name.to_string(), filename, path.clone(), container)
            .await;

        if path.is_some() {
            let saved = match self.save_vault(&id).await {
                Ok(result) if result.success => Ok(()),
                Ok(result) => Err(result
                    .error
                    .unwrap_or_else(|| VaultError::io("Initial save failed"))),
                Err(e) => Err(e),
            };
            if let Err(e) = saved {
                log::error!("Initial save of '{}' failed: {}", name, e);
                self.unregister(&id).await;
                return Err(e);
            }
            self.touch_recent(&id).await;
        }

        self.events.emit(VaultEvent::Created {
            vault_id: id.clone(),
            name: name.to_string(),
        });
        log::info!("Created vault '{}' ({})", name, id);
        self.vault_info(&id).await
    }

    /// Unlock a vault file.
    pub async fn open_vault(&self, path: &Path, credentials: Credentials) -> VaultResult<VaultInfo> {
        if !self.fs.exists(path).await {
            return Err(VaultError::io(format!("Vault file not found: {}", path.display())));
        }
        let bytes = self.fs.read(path).await?;
        self.open_bytes(file_name(path), &bytes, credentials, Some(path.to_path_buf()))
            .await
    }

    /// Unlock a vault from raw bytes, e.g. a file picked without a usable
    /// path. Such vaults stay in memory until saved somewhere.
    pub async fn open_from_bytes(
        &self,
        filename: &str,
        bytes: &[u8],
        credentials: Credentials,
    ) -> VaultResult<VaultInfo> {
        self.open_bytes(filename.to_string(), bytes, credentials, None).await
    }

    async fn open_bytes(
        &self,
        filename: String,
        bytes: &[u8],
        credentials: Credentials,
        path: Option<PathBuf>,
    ) -> VaultResult<VaultInfo> {
        let container = SealedContainer::load(bytes, Arc::new(credentials))?;
        let name = display_name(Path::new(&filename));
        let id = self.register(name.clone(), filename, path, container).await;
        self.touch_recent(&id).await;

        self.events.emit(VaultEvent::Opened {
            vault_id: id.clone(),
            name: name.clone(),
        });
        log::info!("Opened vault '{}' ({})", name, id);
        self.vault_info(&id).await
    }

    async fn register(
        &self,
        name: String,
        filename: String,
        path: Option<PathBuf>,
        container: SealedContainer,
    ) -> VaultId {
        let id = Uuid::new_v4().to_string();
        let state = VaultState {
            id: id.clone(),
            name,
            filename,
            path,
            container,
            revision: 0,
            saved_revision: 0,
        };
        self.vaults.lock().await.insert(id.clone(), state);
        id
    }

    /// Close a vault, optionally writing pending changes first.
    pub async fn close_vault(&self, id: &str, save_first: bool) -> VaultResult<()> {
        self.end_session(id, save_first).await?;
        self.events.emit(VaultEvent::Closed { vault_id: id.to_string() });
        log::info!("Closed vault {}", id);
        Ok(())
    }

    /// Lock a vault: unsaved changes of a file-backed vault are written, then
    /// the decrypted state is dropped.
    pub async fn lock_vault(&self, id: &str) -> VaultResult<()> {
        let auto_save = self.settings.read().await.auto_save;
        self.end_session(id, auto_save).await?;
        self.events.emit(VaultEvent::Locked { vault_id: id.to_string() });
        log::info!("Locked vault {}", id);
        Ok(())
    }

    /// Close every open vault; returns the ids that failed to close.
    pub async fn close_all(&self, save_first: bool) -> Vec<VaultId> {
        let ids: Vec<VaultId> = self.vaults.lock().await.keys().cloned().collect();
        let results = futures::future::join_all(ids.iter().map(|id| self.close_vault(id, save_first))).await;
        ids.into_iter()
            .zip(results)
            .filter_map(|(id, r)| match r {
                Ok(()) => None,
                Err(e) => {
                    log::error!("Failed to close vault {}: {}", id, e);
                    Some(id)
                }
            })
            .collect()
    }

    async fn end_session(&self, id: &str, save_first: bool) -> VaultResult<()> {
        let (dirty, has_path) = {
            let vaults = self.vaults.lock().await;
            let vault = vaults.get(id).ok_or_else(|| VaultError::vault_not_found(id))?;
            (vault.is_dirty(), vault.path.is_some())
        };

        // pending auto-save timers see a missing generation and stand down
        self.auto_save_generation.lock().await.remove(id);

        if save_first && dirty && has_path {
            let result = self.save_vault(id).await?;
            if !result.success {
                return Err(result
                    .error
                    .unwrap_or_else(|| VaultError::io("Save before close failed")));
            }
        }

        self.unregister(id).await;
        Ok(())
    }

    async fn unregister(&self, id: &str) {
        self.vaults.lock().await.remove(id);
        self.save_gates.lock().await.remove(id);
        self.auto_save_generation.lock().await.remove(id);
    }

    // ─── Queries ──────────────────────────────────────────────────────

    pub async fn list_vaults(&self) -> Vec<VaultInfo> {
        let vaults = self.vaults.lock().await;
        let mut list: Vec<VaultInfo> = vaults.values().map(VaultState::info).collect();
        list.sort_by(|a, b| a.name.cmp(&b.name));
        list
    }

    pub async fn vault_info(&self, id: &str) -> VaultResult<VaultInfo> {
        self.with_vault(id, VaultState::info).await
    }

    /// Run `f` against an open vault under the store lock.
    pub async fn with_vault<T>(&self, id: &str, f: impl FnOnce(&VaultState) -> T) -> VaultResult<T> {
        let vaults = self.vaults.lock().await;
        let vault = vaults.get(id).ok_or_else(|| VaultError::vault_not_found(id))?;
        Ok(f(vault))
    }

    /// Fresh projection of the vault tree.
    pub async fn tree(&self, id: &str) -> VaultResult<Vec<VaultGroup>> {
        self.with_vault(id, |v| project(v.container.document())).await
    }

    pub async fn smart_view(&self, id: &str, view: SmartView) -> VaultResult<Vec<VaultEntry>> {
        self.with_vault(id, |v| views::smart_view(&project(v.container.document()), view))
            .await
    }

    pub async fn search(&self, id: &str, query: &str) -> VaultResult<Vec<VaultEntry>> {
        self.with_vault(id, |v| views::search(&project(v.container.document()), query))
            .await
    }

    pub async fn deletion_kind(&self, id: &str, entry: &Uuid) -> VaultResult<DeletionKind> {
        self.with_vault(id, |v| v.container.document().deletion_kind(entry))
            .await?
    }

    pub async fn is_entry_in_recycle_bin(&self, id: &str, entry: &Uuid) -> VaultResult<bool> {
        self.with_vault(id, |v| v.container.document().is_entry_in_recycle_bin(entry))
            .await
    }

    pub async fn original_group_info(&self, id: &str, entry: &Uuid) -> VaultResult<GroupInfo> {
        self.with_vault(id, |v| v.container.document().original_group_info(entry))
            .await?
    }

    pub async fn properties(&self, id: &str) -> VaultResult<VaultProperties> {
        self.with_vault(id, |v| properties(&v.container)).await
    }

    // ─── Mutations ────────────────────────────────────────────────────

    /// Apply one command. Success bumps the revision, emits `Mutated` and
    /// schedules an auto-save; failure changes nothing and emits
    /// `MutationFailed`.
    pub async fn execute(self: &Arc<Self>, id: &str, command: VaultCommand) -> VaultResult<CommandOutcome> {
        let fallback = self.settings.read().await.restore_fallback;
        let result = {
            let mut vaults = self.vaults.lock().await;
            let vault = vaults.get_mut(id).ok_or_else(|| VaultError::vault_not_found(id))?;
            apply(&mut vault.container, &command, fallback).map(|outcome| {
                if !is_noop(&outcome) {
                    vault.revision += 1;
                }
                (outcome, vault.revision)
            })
        };

        match result {
            Ok((outcome, revision)) => {
                log::debug!("{} applied to {} (revision {})", command.name(), id, revision);
                if !is_noop(&outcome) {
                    self.events.emit(VaultEvent::Mutated {
                        vault_id: id.to_string(),
                        command: command.name().to_string(),
                        revision,
                    });
                    self.schedule_auto_save(id).await;
                }
                Ok(outcome)
            }
            Err(error) => {
                log::warn!("{} failed on {}: {}", command.name(), id, error);
                self.events.emit(VaultEvent::MutationFailed {
                    vault_id: id.to_string(),
                    command: command.name().to_string(),
                    error: error.clone(),
                });
                Err(error)
            }
        }
    }

    /// Change the master key; the next save re-derives the encryption key.
    pub async fn change_credentials(
        self: &Arc<Self>,
        id: &str,
        current_password: &str,
        new_password: &str,
        key_file: KeyFileChange,
    ) -> VaultResult<()> {
        let revision = {
            let mut vaults = self.vaults.lock().await;
            let vault = vaults.get_mut(id).ok_or_else(|| VaultError::vault_not_found(id))?;
            change_credentials(&mut vault.container, current_password, new_password, key_file)?;
            vault.revision += 1;
            vault.revision
        };
        self.events.emit(VaultEvent::Mutated {
            vault_id: id.to_string(),
            command: "change_credentials".to_string(),
            revision,
        });
        self.schedule_auto_save(id).await;
        Ok(())
    }

    // ─── Import / Export ──────────────────────────────────────────────

    /// Parse another manager's export and add its entries to `target`.
    pub async fn import_entries(
        self: &Arc<Self>,
        id: &str,
        target: Uuid,
        format: ImportFormat,
        data: &str,
    ) -> VaultResult<ImportResult> {
        let entries = parse_import(format, data)?;
        self.import_forms(id, target, entries).await
    }

    /// Unlock another vault file and copy all of its entries into `target`.
    pub async fn import_vault_file(
        self: &Arc<Self>,
        id: &str,
        target: Uuid,
        source: &Path,
        credentials: Credentials,
    ) -> VaultResult<ImportResult> {
        let bytes = self.fs.read(source).await?;
        let credentials = Arc::new(credentials);
        let entries = tokio::task::spawn_blocking(move || parse_vault_entries::<SealedContainer>(&bytes, credentials))
            .await
            .map_err(|e| VaultError::crypto(format!("Import task failed: {}", e)))??;
        self.import_forms(id, target, entries).await
    }

    async fn import_forms(
        self: &Arc<Self>,
        id: &str,
        target: Uuid,
        entries: Vec<EntryForm>,
    ) -> VaultResult<ImportResult> {
        match self.execute(id, VaultCommand::ImportEntries { target, entries }).await? {
            CommandOutcome::Imported(result) => Ok(result),
            other => Err(VaultError::invalid_operation(format!("Unexpected import outcome: {:?}", other))),
        }
    }

    /// Selected entries (all when `None`) as CSV text.
    pub async fn export_csv(&self, id: &str, selection: Option<Vec<Uuid>>) -> VaultResult<String> {
        let entries = self
            .with_vault(id, |v| select_entries(v.container.document(), selection.as_deref()))
            .await?;
        log::info!("Exporting {} entries of {} as CSV", entries.len(), id);
        entries_to_csv(&entries)
    }

    /// Write selected entries into a new vault file with its own master key.
    /// The file is written through the same backup-and-verify path as a
    /// normal save; it is not opened.
    pub async fn export_to_vault(
        &self,
        id: &str,
        selection: Option<Vec<Uuid>>,
        name: &str,
        credentials: Credentials,
        path: &Path,
    ) -> VaultResult<SafeSaveResult> {
        let entries = {
            let vaults = self.vaults.lock().await;
            if vaults.values().any(|v| v.path.as_deref() == Some(path)) {
                return Err(VaultError::invalid_operation(
                    "Cannot export over a vault that is currently open",
                ));
            }
            let vault = vaults.get(id).ok_or_else(|| VaultError::vault_not_found(id))?;
            select_entries(vault.container.document(), selection.as_deref())
        };

        let (create, options) = {
            let settings = self.settings.read().await;
            (settings.create_options(), settings.safe_save_options())
        };
        let credentials = Arc::new(credentials);
        let sealing = Arc::clone(&credentials);
        let name = name.to_string();
        let bytes = tokio::task::spawn_blocking(move || {
            entries_to_vault::<SealedContainer>(&entries, &name, sealing, &create)?.save()
        })
        .await
        .map_err(|e| VaultError::crypto(format!("Seal task failed: {}", e)))??;

        let result =
            safe_save_bytes::<SealedContainer>(&*self.fs, path, &bytes, credentials, &options, &*self.clock).await;
        if result.success {
            log::info!("Exported {} to {}", id, path.display());
        } else {
            log::warn!("Export of {} to {} failed", id, path.display());
        }
        Ok(result)
    }

    // ─── Files / Backups ──────────────────────────────────────────────

    pub async fn verify_file(&self, path: &Path, credentials: Credentials) -> VerifyReport {
        verify_vault_file::<SealedContainer>(&*self.fs, path, Arc::new(credentials)).await
    }

    pub async fn list_backups(&self, path: &Path) -> VaultResult<Vec<BackupInfo>> {
        let app_data = self.settings.read().await.app_data_dir.clone();
        list_backups(&*self.fs, path, &app_data).await
    }

    /// Copy `backup` over `original`. Refused while the vault is open.
    pub async fn restore_backup(&self, original: &Path, backup: &Path) -> VaultResult<()> {
        let open = self
            .vaults
            .lock()
            .await
            .values()
            .any(|v| v.path.as_deref() == Some(original));
        if open {
            return Err(VaultError::invalid_operation(
                "Close the vault before restoring a backup over it",
            ));
        }
        restore_from_backup(&*self.fs, original, backup).await
    }

    // ─── Recent Vaults ────────────────────────────────────────────────

    pub async fn recent_vaults(&self) -> Vec<RecentVault> {
        self.recent.lock().await.items().to_vec()
    }

    pub async fn remove_recent(&self, path: Option<&str>, filename: &str) -> VaultResult<bool> {
        let mut recent = self.recent.lock().await;
        let removed = recent.remove(path, filename);
        if removed {
            recent.save(&*self.fs).await?;
        }
        Ok(removed)
    }

    pub async fn clear_recent(&self) -> VaultResult<()> {
        let mut recent = self.recent.lock().await;
        recent.clear();
        recent.save(&*self.fs).await
    }

    pub(crate) async fn touch_recent(&self, id: &str) {
        let Ok((path, filename)) = self
            .with_vault(id, |v| {
                (
                    v.path.as_ref().map(|p| p.to_string_lossy().into_owned()),
                    v.filename.clone(),
                )
            })
            .await
        else {
            return;
        };

        let mut recent = self.recent.lock().await;
        recent.record(path.as_deref(), &filename, self.clock.now());
        if let Err(e) = recent.save(&*self.fs).await {
            log::warn!("Failed to persist recent vaults: {}", e);
        }
    }
}
