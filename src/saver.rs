// ── keedavault / saver ─────────────────────────────────────────────────────────
//
// Durable saves for open vaults. A save snapshots the container under the
// store lock, then seals and writes it without holding that lock, so saves of
// different vaults run independently. Saves of the same vault queue on a
// per-vault gate. Auto-saves are debounced.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;

use keeda_core::{VaultError, VaultErrorKind, VaultResult};
use keeda_storage::{safe_save_bytes, SafeSaveResult};
use keeda_vault::{Container, SealedContainer};

use crate::events::VaultEvent;
use crate::store::VaultStore;

/// What a save run did.
enum SaveRun {
    Done(SafeSaveResult),
    /// The vault has no file to write to
    NoPath,
}

impl VaultStore {
    async fn save_gate(&self, id: &str) -> Arc<Mutex<()>> {
        let mut gates = self.save_gates.lock().await;
        Arc::clone(gates.entry(id.to_string()).or_default())
    }

    async fn run_save(&self, id: &str) -> VaultResult<SaveRun> {
        let gate = self.save_gate(id).await;
        let _guard = gate.lock().await;

        let (path, snapshot, revision) = {
            let vaults = self.vaults.lock().await;
            let vault = vaults.get(id).ok_or_else(|| VaultError::vault_not_found(id))?;
            let Some(path) = vault.path.clone() else {
                return Ok(SaveRun::NoPath);
            };
            (path, vault.container.clone(), vault.revision)
        };

        let credentials = snapshot.credentials();
        let bytes = tokio::task::spawn_blocking(move || snapshot.save())
            .await
            .map_err(|e| VaultError::crypto(format!("Seal task failed: {}", e)))??;

        let options = self.settings.read().await.safe_save_options();
        let result = safe_save_bytes::<SealedContainer>(
            &*self.fs,
            &path,
            &bytes,
            credentials,
            &options,
            &*self.clock,
        )
        .await;

        if result.success {
            if let Some(vault) = self.vaults.lock().await.get_mut(id) {
                vault.saved_revision = vault.saved_revision.max(revision);
            }
            self.events.emit(VaultEvent::Saved {
                vault_id: id.to_string(),
                path,
                verified: result.verified,
                backup_path: result.backup_path.clone(),
            });
        } else {
            self.events.emit(VaultEvent::SaveFailed {
                vault_id: id.to_string(),
                error: result
                    .error
                    .clone()
                    .unwrap_or_else(|| VaultError::io("Save failed")),
            });
        }
        Ok(SaveRun::Done(result))
    }

    /// Save now. A vault without a file path is an error here; use
    /// [`VaultStore::save_vault_as`].
    pub async fn save_vault(&self, id: &str) -> VaultResult<SafeSaveResult> {
        match self.run_save(id).await? {
            SaveRun::Done(result) => Ok(result),
            SaveRun::NoPath => Err(VaultError::invalid_operation(
                "Vault has no file path; save it to a location first",
            )),
        }
    }

    /// Point the vault at `path` and save there.
    pub async fn save_vault_as(&self, id: &str, path: PathBuf) -> VaultResult<SafeSaveResult> {
        {
            let mut vaults = self.vaults.lock().await;
            let vault = vaults.get_mut(id).ok_or_else(|| VaultError::vault_not_found(id))?;
            vault.filename = path
                .file_name()
                .map(|s| s.to_string_lossy().into_owned())
                .unwrap_or_else(|| vault.filename.clone());
            vault.path = Some(path);
        }
        let result = self.save_vault(id).await?;
        if result.success {
            self.touch_recent(id).await;
        }
        Ok(result)
    }

    // ─── Auto-save ────────────────────────────────────────────────────

    /// Save after the debounce window unless another request for the same
    /// vault arrives first.
    pub(crate) async fn schedule_auto_save(self: &Arc<Self>, id: &str) {
        let (enabled, delay_ms) = {
            let settings = self.settings.read().await;
            (settings.auto_save, settings.auto_save_debounce_ms)
        };
        if !enabled {
            return;
        }

        let generation = {
            let mut generations = self.auto_save_generation.lock().await;
            let current = generations.entry(id.to_string()).or_insert(0);
            *current += 1;
            *current
        };

        let store = Arc::clone(self);
        let id = id.to_string();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(delay_ms)).await;
            let latest = store.auto_save_generation.lock().await.get(&id).copied();
            if latest != Some(generation) {
                return;
            }
            store.auto_save(&id).await;
        });
    }

    async fn auto_save(&self, id: &str) {
        match self.run_save(id).await {
            Ok(SaveRun::Done(result)) => {
                if !result.success {
                    log::error!("Auto-save of {} failed: {:?}", id, result.error);
                }
            }
            Ok(SaveRun::NoPath) => {
                log::info!("Auto-save skipped for {}: vault has no file path", id);
                self.events.emit(VaultEvent::SaveSkipped {
                    vault_id: id.to_string(),
                    reason: "Vault has no file path".to_string(),
                });
            }
            Err(e) if e.is(VaultErrorKind::VaultNotFound) => {
                log::debug!("Auto-save for {} dropped: vault closed", id);
            }
            Err(e) => {
                log::error!("Auto-save of {} failed: {}", id, e);
                self.events.emit(VaultEvent::SaveFailed {
                    vault_id: id.to_string(),
                    error: e,
                });
            }
        }
    }
}
