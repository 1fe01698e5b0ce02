// ── keeda-storage / paths ──────────────────────────────────────────────────────
//
// Cloud-sync path detection and the stable path hash used to name backups of
// cloud-hosted vaults.

use std::path::PathBuf;

/// Path fragments of folders kept in sync by cloud storage clients.
const CLOUD_PATTERNS: [&str; 5] = [
    "/Library/Mobile Documents/com~apple~CloudDocs",
    "/Dropbox/",
    "/Google Drive/",
    "/OneDrive/",
    "/gdrive/",
];

pub const APP_DIR_NAME: &str = "KeedaVault";

fn normalize(path: &str) -> String {
    path.replace('\\', "/")
}

/// Whether `path` lives in a cloud-synced folder.
pub fn is_cloud_path(path: &str) -> bool {
    let normalized = normalize(path);
    CLOUD_PATTERNS.iter().any(|p| normalized.contains(p))
}

/// 16-character identifier for a path: 32-bit rolling hash (`h * 31 + c`
/// over UTF-16 code units), absolute value, base 36, right-padded with `0`.
pub fn hash_path(path: &str) -> String {
    let normalized = normalize(path);
    let mut hash: i32 = 0;
    for unit in normalized.encode_utf16() {
        hash = hash
            .wrapping_shl(5)
            .wrapping_sub(hash)
            .wrapping_add(i32::from(unit));
    }

    let mut encoded = to_base36(i64::from(hash).unsigned_abs());
    encoded.truncate(16);
    while encoded.len() < 16 {
        encoded.push('0');
    }
    encoded
}

fn to_base36(mut value: u64) -> String {
    const DIGITS: &[u8; 36] = b"0123456789abcdefghijklmnopqrstuvwxyz";
    if value == 0 {
        return "0".to_string();
    }
    let mut out = Vec::new();
    while value > 0 {
        out.push(DIGITS[(value % 36) as usize]);
        value /= 36;
    }
    out.reverse();
    String::from_utf8_lossy(&out).into_owned()
}

/// Per-user application data directory.
pub fn default_app_data_dir() -> PathBuf {
    dirs::data_dir()
        .unwrap_or_else(std::env::temp_dir)
        .join(APP_DIR_NAME)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn detects_cloud_folders() {
        assert!(is_cloud_path("/Users/me/Library/Mobile Documents/com~apple~CloudDocs/v.kdbx"));
        assert!(is_cloud_path("/home/me/Dropbox/v.kdbx"));
        assert!(is_cloud_path(r"C:\Users\me\OneDrive\vault.kdbx"));
        assert!(is_cloud_path(r"D:\Google Drive\vault.kdbx"));
        assert!(is_cloud_path("/mnt/gdrive/vault.kdbx"));
        assert!(!is_cloud_path("/home/me/Documents/vault.kdbx"));
        assert!(!is_cloud_path("/home/me/DropboxArchive.kdbx"));
    }

    #[test]
    fn hash_is_stable_and_padded() {
        // "a" hashes to 97 = "2p" in base 36
        assert_eq!(hash_path("a"), "2p00000000000000");
        assert_eq!(hash_path(""), "0000000000000000");
        let h = hash_path("/home/me/Dropbox/vault.kdbx");
        assert_eq!(h.len(), 16);
        assert_eq!(h, hash_path(r"\home\me\Dropbox\vault.kdbx"));
    }

    #[test]
    fn hash_wraps_like_32_bit_arithmetic() {
        // h("ab") = 97 * 31 + 98 = 3105 = "2e9"
        assert_eq!(hash_path("ab"), "2e90000000000000");
        // long inputs overflow and still produce 16 characters
        let long = "x".repeat(500);
        assert_eq!(hash_path(&long).len(), 16);
    }

    #[test]
    fn base36() {
        assert_eq!(to_base36(0), "0");
        assert_eq!(to_base36(35), "z");
        assert_eq!(to_base36(36), "10");
        assert_eq!(to_base36(2_147_483_648), "zik0zk");
    }
}
