// ── keeda-storage / backup ─────────────────────────────────────────────────────
//
// Timestamped vault backups: naming, creation, rotation (keep newest N),
// listing and manual restore.
//
// Local vault   /dir/name.kdvx   →  /dir/name.backup.2025-12-12T10-30-45.kdvx
// Cloud vault   …/Dropbox/x.kdvx →  {app_data}/backups/{hash16}.backup.{ts}.kdvx

use chrono::{DateTime, NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use keeda_core::{Clock, VaultError, VaultResult};

use crate::fs::VaultFs;
use crate::paths::{hash_path, is_cloud_path};

pub const BACKUP_MARKER: &str = ".backup.";
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%dT%H-%M-%S";
pub const BACKUP_DIR_NAME: &str = "backups";
pub const DEFAULT_EXTENSION: &str = "kdvx";

/// A backup file found on disk.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BackupInfo {
    pub path: PathBuf,
    pub created: DateTime<Utc>,
}

/// Where backups of one vault live and how they are named.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BackupLocation {
    pub dir: PathBuf,
    /// `{stem}` for local vaults, `{hash16}` for cloud vaults
    pub prefix: String,
    pub extension: String,
}

impl BackupLocation {
    pub fn for_vault(original: &Path, app_data: &Path) -> Self {
        let extension = original
            .extension()
            .and_then(|e| e.to_str())
            .filter(|e| !e.is_empty())
            .unwrap_or(DEFAULT_EXTENSION)
            .to_string();

        let original_str = original.to_string_lossy();
        if is_cloud_path(&original_str) {
            return Self {
                dir: app_data.join(BACKUP_DIR_NAME),
                prefix: hash_path(&original_str),
                extension,
            };
        }

        let dir = match original.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
            _ => PathBuf::from("."),
        };
        let prefix = original
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_default();
        Self { dir, prefix, extension }
    }

    pub fn file_name_at(&self, at: DateTime<Utc>) -> String {
        format!(
            "{}{}{}.{}",
            self.prefix,
            BACKUP_MARKER,
            at.format(TIMESTAMP_FORMAT),
            self.extension
        )
    }

    pub fn path_at(&self, at: DateTime<Utc>) -> PathBuf {
        self.dir.join(self.file_name_at(at))
    }

    /// The timestamp embedded in a backup file name belonging to this vault.
    pub fn parse_timestamp(&self, file_name: &str) -> Option<DateTime<Utc>> {
        let rest = file_name
            .strip_prefix(&self.prefix)?
            .strip_prefix(BACKUP_MARKER)?;
        let stamp = rest.strip_suffix(&format!(".{}", self.extension))?;
        NaiveDateTime::parse_from_str(stamp, TIMESTAMP_FORMAT)
            .ok()
            .map(|naive| naive.and_utc())
    }
}

// ─── Create ───────────────────────────────────────────────────────────────────

/// Copy the current bytes of `original` into a new timestamped backup.
pub async fn create_backup(
    fs: &dyn VaultFs,
    original: &Path,
    app_data: &Path,
    clock: &dyn Clock,
) -> VaultResult<PathBuf> {
    let location = BackupLocation::for_vault(original, app_data);
    let backup_path = location.path_at(clock.now());

    if !fs.exists(&location.dir).await {
        log::info!("[Backup] Creating backup directory: {}", location.dir.display());
        fs.create_dir_all(&location.dir).await?;
    }

    let data = fs.read(original).await?;
    fs.write(&backup_path, &data).await?;
    log::info!("[Backup] Created {}", backup_path.display());
    Ok(backup_path)
}

// ─── List / Cleanup ───────────────────────────────────────────────────────────

/// Backups of `original`, newest first. Files whose timestamp does not parse
/// are skipped.
pub async fn list_backups(fs: &dyn VaultFs, original: &Path, app_data: &Path) -> VaultResult<Vec<BackupInfo>> {
    let location = BackupLocation::for_vault(original, app_data);
    if !fs.exists(&location.dir).await {
        return Ok(Vec::new());
    }

    let mut backups = Vec::new();
    for path in fs.list(&location.dir).await? {
        let Some(name) = path.file_name().and_then(|n| n.to_str()) else {
            continue;
        };
        if !name.starts_with(&location.prefix) || !name.contains(BACKUP_MARKER) {
            continue;
        }
        match location.parse_timestamp(name) {
            Some(created) => backups.push(BackupInfo { path, created }),
            None => log::warn!("[Backup] Skipping {}: invalid timestamp", name),
        }
    }

    backups.sort_by(|a, b| b.created.cmp(&a.created));
    Ok(backups)
}

/// Delete all but the newest `max_backups` backups. Returns how many were
/// removed; a failed removal is logged and skipped.
pub async fn cleanup_old_backups(
    fs: &dyn VaultFs,
    original: &Path,
    app_data: &Path,
    max_backups: usize,
) -> VaultResult<usize> {
    let backups = list_backups(fs, original, app_data).await?;
    if backups.len() <= max_backups {
        log::debug!("[Backup Cleanup] No cleanup needed ({} <= {})", backups.len(), max_backups);
        return Ok(0);
    }

    let mut removed = 0;
    for backup in backups.iter().skip(max_backups) {
        match fs.remove(&backup.path).await {
            Ok(()) => {
                removed += 1;
                log::info!("[Backup Cleanup] Deleted {}", backup.path.display());
            }
            Err(e) => log::error!("[Backup Cleanup] Failed to delete {}: {}", backup.path.display(), e),
        }
    }
    Ok(removed)
}

// ─── Restore ──────────────────────────────────────────────────────────────────

/// Overwrite `original` with the contents of `backup`.
pub async fn restore_from_backup(fs: &dyn VaultFs, original: &Path, backup: &Path) -> VaultResult<()> {
    if !fs.exists(backup).await {
        return Err(VaultError::io(format!("Backup file not found: {}", backup.display())));
    }
    let data = fs.read(backup).await?;
    fs.write(original, &data).await?;
    log::info!("[Backup] Restored {} from {}", original.display(), backup.display());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fs::TokioFs;
    use chrono::{Duration, TimeZone};
    use keeda_core::ManualClock;

    fn start() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 12, 12, 10, 30, 45).unwrap()
    }

    // ── Naming ──────────────────────────────────────────────────────────

    #[test]
    fn local_backup_sits_next_to_vault() {
        let loc = BackupLocation::for_vault(Path::new("/home/me/vaults/work.kdbx"), Path::new("/appdata"));
        assert_eq!(
            loc.path_at(start()),
            PathBuf::from("/home/me/vaults/work.backup.2025-12-12T10-30-45.kdbx")
        );
    }

    #[test]
    fn cloud_backup_goes_to_app_data() {
        let original = "/home/me/Dropbox/work.kdbx";
        let loc = BackupLocation::for_vault(Path::new(original), Path::new("/appdata"));
        assert_eq!(loc.dir, PathBuf::from("/appdata/backups"));
        assert_eq!(loc.prefix, hash_path(original));
        let name = loc.file_name_at(start());
        assert!(name.ends_with(".backup.2025-12-12T10-30-45.kdbx"));
    }

    #[test]
    fn timestamp_parsing() {
        let loc = BackupLocation::for_vault(Path::new("/v/work.kdvx"), Path::new("/a"));
        let name = loc.file_name_at(start());
        assert_eq!(loc.parse_timestamp(&name), Some(start()));
        assert_eq!(loc.parse_timestamp("work.backup.garbage.kdvx"), None);
        assert_eq!(loc.parse_timestamp("other.backup.2025-12-12T10-30-45.kdvx"), None);
    }

    // ── Rotation ────────────────────────────────────────────────────────

    #[tokio::test]
    async fn rotation_keeps_newest() {
        let tmp = tempfile::tempdir().unwrap();
        let fs = TokioFs;
        let vault = tmp.path().join("work.kdvx");
        fs.write(&vault, b"v1").await.unwrap();

        let clock = ManualClock::new(start());
        let mut created = Vec::new();
        for _ in 0..5 {
            created.push(create_backup(&fs, &vault, tmp.path(), &clock).await.unwrap());
            clock.advance(Duration::seconds(1));
        }
        // an unparseable file with the same prefix is ignored
        fs.write(&tmp.path().join("work.backup.latest.kdvx"), b"x").await.unwrap();

        let removed = cleanup_old_backups(&fs, &vault, tmp.path(), 2).await.unwrap();
        assert_eq!(removed, 3);

        let left = list_backups(&fs, &vault, tmp.path()).await.unwrap();
        let paths: Vec<PathBuf> = left.into_iter().map(|b| b.path).collect();
        assert_eq!(paths, vec![created[4].clone(), created[3].clone()]);
        assert!(fs.exists(&tmp.path().join("work.backup.latest.kdvx")).await);
    }

    #[tokio::test]
    async fn missing_backup_dir_lists_nothing() {
        let tmp = tempfile::tempdir().unwrap();
        let backups = list_backups(&TokioFs, Path::new("/home/me/Dropbox/x.kdvx"), tmp.path())
            .await
            .unwrap();
        assert!(backups.is_empty());
    }

    // ── Restore ─────────────────────────────────────────────────────────

    #[tokio::test]
    async fn restore_copies_backup_over_original() {
        let tmp = tempfile::tempdir().unwrap();
        let fs = TokioFs;
        let vault = tmp.path().join("work.kdvx");
        fs.write(&vault, b"good").await.unwrap();
        let clock = ManualClock::new(start());
        let backup = create_backup(&fs, &vault, tmp.path(), &clock).await.unwrap();

        fs.write(&vault, b"broken").await.unwrap();
        restore_from_backup(&fs, &vault, &backup).await.unwrap();
        assert_eq!(fs.read(&vault).await.unwrap(), b"good");

        let err = restore_from_backup(&fs, &vault, &tmp.path().join("nope")).await.unwrap_err();
        assert!(err.message.contains("Backup file not found"));
    }
}
