// ── keeda-storage / safe_save ──────────────────────────────────────────────────
//
// Integrity-protected save:
//
//   1. back up the existing file (failure is logged, the save goes on)
//   2. write the new bytes to `{path}.tmp`
//   3. re-open the temp file with the same credentials
//   4. replace the original with the temp bytes, drop the temp file
//   5. on any failure in 2–4: drop the temp file and, when a backup exists,
//      put it back if the original is missing or no longer opens
//
// The original file is never touched before step 3 passes.

use serde::{Deserialize, Serialize};
use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;

use keeda_core::{Clock, VaultError, VaultResult};
use keeda_vault::{Container, Credentials};

use crate::backup::{cleanup_old_backups, create_backup};
use crate::fs::VaultFs;
use crate::paths::default_app_data_dir;

// ─── Options / Results ────────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SafeSaveOptions {
    pub create_backup: bool,
    pub max_backups: usize,
    pub verify_after_write: bool,
    /// Root for backups of cloud-hosted vaults
    pub app_data_dir: PathBuf,
}

impl Default for SafeSaveOptions {
    fn default() -> Self {
        Self {
            create_backup: true,
            max_backups: 2,
            verify_after_write: true,
            app_data_dir: default_app_data_dir(),
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum StepStatus {
    Pass,
    Fail,
    Skip,
    Warn,
}

/// One stage of a save, for diagnostics.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SaveStep {
    pub name: String,
    pub status: StepStatus,
    pub message: String,
    pub duration_ms: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SafeSaveResult {
    pub success: bool,
    /// The written bytes were re-opened successfully
    pub verified: bool,
    pub backup_path: Option<PathBuf>,
    pub error: Option<VaultError>,
    pub steps: Vec<SaveStep>,
}

/// Summary of a file that opened successfully.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct VerifyDetails {
    pub entries: usize,
    pub groups: usize,
    pub name: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct VerifyReport {
    pub valid: bool,
    pub error: Option<String>,
    pub details: Option<VerifyDetails>,
}

pub fn temp_path(path: &Path) -> PathBuf {
    let mut os: OsString = path.as_os_str().to_owned();
    os.push(".tmp");
    PathBuf::from(os)
}

struct Steps(Vec<SaveStep>);

impl Steps {
    fn push(&mut self, name: &str, status: StepStatus, message: impl Into<String>, started: Instant) {
        self.0.push(SaveStep {
            name: name.to_string(),
            status,
            message: message.into(),
            duration_ms: started.elapsed().as_millis() as u64,
        });
    }
}

// ─── Verification ─────────────────────────────────────────────────────────────

/// Open `path` with `credentials`; it must load, expose a root group and let
/// its entries be enumerated.
async fn check_file<C: Container>(
    fs: &dyn VaultFs,
    path: &Path,
    credentials: &Arc<Credentials>,
) -> VaultResult<VerifyDetails> {
    let bytes = fs.read(path).await?;
    let container = C::load(&bytes, Arc::clone(credentials))?;
    let doc = container.document();
    let root = doc
        .root_group()
        .ok_or_else(|| VaultError::verification_failed("No root group found"))?;
    let root_entries = root.entries.iter().filter(|e| doc.entry(e).is_some()).count();
    log::debug!("Verification: found {} entries in root", root_entries);

    Ok(VerifyDetails {
        entries: doc.entry_count(),
        groups: doc.group_count(),
        name: doc.meta.name.clone(),
    })
}

/// Standalone integrity check of a vault file.
pub async fn verify_vault_file<C: Container>(
    fs: &dyn VaultFs,
    path: &Path,
    credentials: Arc<Credentials>,
) -> VerifyReport {
    match check_file::<C>(fs, path, &credentials).await {
        Ok(details) => VerifyReport {
            valid: true,
            error: None,
            details: Some(details),
        },
        Err(e) => VerifyReport {
            valid: false,
            error: Some(e.message),
            details: None,
        },
    }
}

// ─── Save ─────────────────────────────────────────────────────────────────────

/// Serialize `container` and persist it with backup, verification and
/// rollback.
pub async fn safe_save<C: Container>(
    fs: &dyn VaultFs,
    path: &Path,
    container: &C,
    options: &SafeSaveOptions,
    clock: &dyn Clock,
) -> SafeSaveResult {
    match container.save() {
        Ok(bytes) => safe_save_bytes::<C>(fs, path, &bytes, container.credentials(), options, clock).await,
        Err(e) => {
            log::error!("Failed to serialize vault for {}: {}", path.display(), e);
            SafeSaveResult {
                success: false,
                verified: false,
                backup_path: None,
                error: Some(e),
                steps: Vec::new(),
            }
        }
    }
}

/// Persist already-serialized container bytes. `C` is the container type
/// used to re-open the written file.
pub async fn safe_save_bytes<C: Container>(
    fs: &dyn VaultFs,
    path: &Path,
    bytes: &[u8],
    credentials: Arc<Credentials>,
    options: &SafeSaveOptions,
    clock: &dyn Clock,
) -> SafeSaveResult {
    let mut steps = Steps(Vec::new());
    let mut backup_path = None;

    // Step 1: backup
    let started = Instant::now();
    if options.create_backup && fs.exists(path).await {
        match create_backup(fs, path, &options.app_data_dir, clock).await {
            Ok(created) => {
                steps.push("Backup", StepStatus::Pass, created.display().to_string(), started);
                if let Err(e) = cleanup_old_backups(fs, path, &options.app_data_dir, options.max_backups).await {
                    log::warn!("Failed to clean up old backups: {}", e);
                }
                backup_path = Some(created);
            }
            Err(e) => {
                log::error!("Failed to create backup: {}", e);
                log::warn!("Proceeding without backup due to error");
                steps.push("Backup", StepStatus::Warn, e.message, started);
            }
        }
    } else {
        steps.push("Backup", StepStatus::Skip, "No existing file or backups disabled", started);
    }

    // Steps 2–4
    match write_verify_replace::<C>(fs, path, bytes, &credentials, options, &mut steps).await {
        Ok(verified) => {
            log::info!("Saved {} (verified: {})", path.display(), verified);
            SafeSaveResult {
                success: true,
                verified,
                backup_path,
                error: None,
                steps: steps.0,
            }
        }
        Err(error) => {
            log::error!("Save failed for {}: {}", path.display(), error);
            recover::<C>(fs, path, backup_path.as_deref(), &credentials, &mut steps).await;
            SafeSaveResult {
                success: false,
                verified: false,
                backup_path,
                error: Some(error),
                steps: steps.0,
            }
        }
    }
}

async fn write_verify_replace<C: Container>(
    fs: &dyn VaultFs,
    path: &Path,
    bytes: &[u8],
    credentials: &Arc<Credentials>,
    options: &SafeSaveOptions,
    steps: &mut Steps,
) -> VaultResult<bool> {
    let temp = temp_path(path);

    let started = Instant::now();
    if let Err(e) = fs.write(&temp, bytes).await {
        steps.push("Write", StepStatus::Fail, e.message.clone(), started);
        return Err(e);
    }
    steps.push("Write", StepStatus::Pass, temp.display().to_string(), started);

    let started = Instant::now();
    let verified = if options.verify_after_write {
        if let Err(e) = check_file::<C>(fs, &temp, credentials).await {
            let error = VaultError::verification_failed(format!("Verification failed: {}", e.message));
            steps.push("Verify", StepStatus::Fail, error.message.clone(), started);
            return Err(error);
        }
        steps.push("Verify", StepStatus::Pass, "Written data re-opened", started);
        true
    } else {
        steps.push("Verify", StepStatus::Skip, "Verification disabled", started);
        false
    };

    let started = Instant::now();
    let replaced: VaultResult<()> = async {
        if fs.exists(path).await {
            fs.remove(path).await?;
        }
        let data = fs.read(&temp).await?;
        fs.write(path, &data).await?;
        fs.remove(&temp).await
    }
    .await;
    match replaced {
        Ok(()) => {
            steps.push("Replace", StepStatus::Pass, path.display().to_string(), started);
            Ok(verified)
        }
        Err(e) => {
            steps.push("Replace", StepStatus::Fail, e.message.clone(), started);
            Err(e)
        }
    }
}

/// Best-effort cleanup after a failed save. Errors are logged only.
async fn recover<C: Container>(
    fs: &dyn VaultFs,
    path: &Path,
    backup: Option<&Path>,
    credentials: &Arc<Credentials>,
    steps: &mut Steps,
) {
    let started = Instant::now();
    let temp = temp_path(path);
    if fs.exists(&temp).await {
        match fs.remove(&temp).await {
            Ok(()) => log::info!("Temporary file cleaned up"),
            Err(e) => log::error!("Failed to remove temporary file: {}", e),
        }
    }

    let Some(backup) = backup else {
        steps.push("Recovery", StepStatus::Skip, "No backup available", started);
        return;
    };
    if !fs.exists(backup).await {
        steps.push("Recovery", StepStatus::Skip, "Backup missing", started);
        return;
    }

    let needs_restore = if !fs.exists(path).await {
        log::warn!("Original file missing, restoring from backup");
        true
    } else if let Err(e) = check_file::<C>(fs, path, credentials).await {
        log::warn!("Original file does not open ({}), restoring from backup", e);
        true
    } else {
        false
    };

    if !needs_restore {
        steps.push("Recovery", StepStatus::Skip, "Original file intact", started);
        return;
    }

    let restored: VaultResult<()> = async {
        let data = fs.read(backup).await?;
        fs.write(path, &data).await
    }
    .await;
    match restored {
        Ok(()) => {
            log::info!("Restored {} from {}", path.display(), backup.display());
            steps.push("Recovery", StepStatus::Pass, "Restored from backup", started);
        }
        Err(e) => {
            log::error!("Recovery failed: {}", e);
            steps.push("Recovery", StepStatus::Fail, e.message, started);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backup::list_backups;
    use crate::fs::TokioFs;
    use async_trait::async_trait;
    use chrono::{Duration, TimeZone, Utc};
    use keeda_core::{ManualClock, VaultErrorKind};
    use keeda_vault::{CreateOptions, CryptoSettings, EntryForm, Kdf, SealedContainer};

    /// Real filesystem that fails writes to chosen paths. With `torn` set, the
    /// failing write leaves the first half of the data behind.
    struct FaultyFs {
        fail_write: Box<dyn Fn(&Path) -> bool + Send + Sync>,
        torn: bool,
    }

    #[async_trait]
    impl VaultFs for FaultyFs {
        async fn read(&self, path: &Path) -> VaultResult<Vec<u8>> {
            TokioFs.read(path).await
        }
        async fn write(&self, path: &Path, data: &[u8]) -> VaultResult<()> {
            if (self.fail_write)(path) {
                if self.torn {
                    TokioFs.write(path, &data[..data.len() / 2]).await?;
                }
                return Err(VaultError::io(format!("injected failure writing {}", path.display())));
            }
            TokioFs.write(path, data).await
        }
        async fn exists(&self, path: &Path) -> bool {
            TokioFs.exists(path).await
        }
        async fn remove(&self, path: &Path) -> VaultResult<()> {
            TokioFs.remove(path).await
        }
        async fn list(&self, dir: &Path) -> VaultResult<Vec<PathBuf>> {
            TokioFs.list(dir).await
        }
        async fn create_dir_all(&self, dir: &Path) -> VaultResult<()> {
            TokioFs.create_dir_all(dir).await
        }
    }

    fn container() -> SealedContainer {
        let opts = CreateOptions {
            crypto: CryptoSettings {
                kdf: Kdf::Argon2id { iterations: 1, memory: 64 * 1024, parallelism: 1 },
                ..Default::default()
            },
            default_groups: true,
        };
        SealedContainer::create("Test", Arc::new(Credentials::password_only("pw")), &opts).unwrap()
    }

    fn options(app_data: &Path) -> SafeSaveOptions {
        SafeSaveOptions {
            app_data_dir: app_data.to_path_buf(),
            ..Default::default()
        }
    }

    fn clock() -> ManualClock {
        ManualClock::new(Utc.with_ymd_and_hms(2025, 12, 12, 10, 30, 45).unwrap())
    }

    // ── Happy path ──────────────────────────────────────────────────────

    #[tokio::test]
    async fn first_save_has_no_backup() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("vault.kdvx");
        let c = container();

        let result = safe_save(&TokioFs, &path, &c, &options(tmp.path()), &clock()).await;
        assert!(result.success, "{:?}", result.error);
        assert!(result.verified);
        assert!(result.backup_path.is_none());
        assert!(!TokioFs.exists(&temp_path(&path)).await);

        let report = verify_vault_file::<SealedContainer>(&TokioFs, &path, c.credentials()).await;
        assert!(report.valid);
        assert_eq!(report.details.unwrap().groups, 7);
    }

    #[tokio::test]
    async fn second_save_backs_up_previous_bytes() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("vault.kdvx");
        let mut c = container();
        let clock = clock();
        safe_save(&TokioFs, &path, &c, &options(tmp.path()), &clock).await;
        let first = TokioFs.read(&path).await.unwrap();

        let root = c.document().root();
        c.document_mut().add_entry(&EntryForm::new(root, "GitHub")).unwrap();
        clock.advance(Duration::seconds(1));
        let result = safe_save(&TokioFs, &path, &c, &options(tmp.path()), &clock).await;

        assert!(result.success);
        let backup = result.backup_path.unwrap();
        assert_eq!(TokioFs.read(&backup).await.unwrap(), first);
        let reloaded = SealedContainer::load(&TokioFs.read(&path).await.unwrap(), c.credentials()).unwrap();
        assert_eq!(reloaded.document().entry_count(), 1);
    }

    #[tokio::test]
    async fn repeated_saves_rotate_backups() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("vault.kdvx");
        let c = container();
        let clock = clock();
        for _ in 0..5 {
            assert!(safe_save(&TokioFs, &path, &c, &options(tmp.path()), &clock).await.success);
            clock.advance(Duration::seconds(1));
        }
        let backups = list_backups(&TokioFs, &path, tmp.path()).await.unwrap();
        assert_eq!(backups.len(), 2);
        assert!(backups[0].created > backups[1].created);
    }

    // ── Failure paths ───────────────────────────────────────────────────

    #[tokio::test]
    async fn failed_verification_leaves_file_untouched() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("vault.kdvx");
        let c = container();
        safe_save(&TokioFs, &path, &c, &options(tmp.path()), &clock()).await;
        let before = TokioFs.read(&path).await.unwrap();

        let result = safe_save_bytes::<SealedContainer>(
            &TokioFs,
            &path,
            b"corrupted bytes",
            c.credentials(),
            &options(tmp.path()),
            &clock(),
        )
        .await;

        assert!(!result.success);
        assert!(!result.verified);
        assert_eq!(result.error.unwrap().kind, VaultErrorKind::VerificationFailed);
        assert_eq!(TokioFs.read(&path).await.unwrap(), before);
        assert!(!TokioFs.exists(&temp_path(&path)).await);
    }

    #[tokio::test]
    async fn replace_failure_restores_from_backup() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("vault.kdvx");
        let c = container();
        safe_save(&TokioFs, &path, &c, &options(tmp.path()), &clock()).await;
        let before = TokioFs.read(&path).await.unwrap();

        // the first write to the vault path itself fails, after it was removed
        let target = path.clone();
        let failed_once = std::sync::atomic::AtomicBool::new(false);
        let fs = FaultyFs {
            fail_write: Box::new(move |p| p == target && !failed_once.swap(true, std::sync::atomic::Ordering::SeqCst)),
            torn: false,
        };
        let result = safe_save(&fs, &path, &c, &options(tmp.path()), &clock()).await;

        assert!(!result.success);
        assert_eq!(result.error.unwrap().kind, VaultErrorKind::Io);
        assert_eq!(TokioFs.read(&path).await.unwrap(), before);
        assert_eq!(result.steps.last().unwrap().status, StepStatus::Pass);
    }

    #[tokio::test]
    async fn torn_replace_is_overwritten_from_backup() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("vault.kdvx");
        let c = container();
        safe_save(&TokioFs, &path, &c, &options(tmp.path()), &clock()).await;
        let before = TokioFs.read(&path).await.unwrap();

        let target = path.clone();
        let failed_once = std::sync::atomic::AtomicBool::new(false);
        let fs = FaultyFs {
            fail_write: Box::new(move |p| p == target && !failed_once.swap(true, std::sync::atomic::Ordering::SeqCst)),
            torn: true,
        };
        let result = safe_save(&fs, &path, &c, &options(tmp.path()), &clock()).await;

        assert!(!result.success);
        assert!(result.backup_path.is_some());
        // the torn file existed, failed to open and was replaced
        assert_eq!(TokioFs.read(&path).await.unwrap(), before);
        assert!(verify_vault_file::<SealedContainer>(&TokioFs, &path, c.credentials()).await.valid);
        let last = result.steps.last().unwrap();
        assert_eq!(last.name, "Recovery");
        assert_eq!(last.status, StepStatus::Pass);
        assert!(!TokioFs.exists(&temp_path(&path)).await);
    }

    #[tokio::test]
    async fn backup_failure_does_not_block_save() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("vault.kdvx");
        let c = container();
        safe_save(&TokioFs, &path, &c, &options(tmp.path()), &clock()).await;

        let fs = FaultyFs {
            fail_write: Box::new(|p| p.to_string_lossy().contains(".backup.")),
            torn: false,
        };
        let result = safe_save(&fs, &path, &c, &options(tmp.path()), &clock()).await;
        assert!(result.success);
        assert!(result.backup_path.is_none());
        assert_eq!(result.steps[0].status, StepStatus::Warn);
    }

    #[tokio::test]
    async fn wrong_credentials_fail_verification_report() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("vault.kdvx");
        safe_save(&TokioFs, &path, &container(), &options(tmp.path()), &clock()).await;

        let report = verify_vault_file::<SealedContainer>(
            &TokioFs,
            &path,
            Arc::new(Credentials::password_only("nope")),
        )
        .await;
        assert!(!report.valid);
        assert!(report.error.is_some());
    }
}
