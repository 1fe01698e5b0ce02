// ── keeda-vault / properties ───────────────────────────────────────────────────
//
// Vault-level metadata, crypto settings and master-key changes. Everything
// here only touches the in-memory container; the next save re-seals with the
// new settings or credentials.

use std::sync::Arc;

use keeda_core::{VaultError, VaultResult};

use super::container::{Container, CryptoSettings};
use super::crypto::{Credentials, KeyFileChange};
use super::types::{PropertiesUpdate, VaultProperties};

// ─── Properties ──────────────────────────────────────────────────────────────

pub fn properties<C: Container>(container: &C) -> VaultProperties {
    let doc = container.document();
    let settings = container.crypto_settings();
    VaultProperties {
        name: doc.meta.name.clone(),
        description: doc.meta.description.clone(),
        cipher: settings.cipher,
        kdf: settings.kdf,
        compression: settings.compression,
        recycle_bin_enabled: doc.meta.recycle_bin_enabled,
        entry_count: doc.entry_count(),
        group_count: doc.group_count(),
        created: doc.meta.created,
    }
}

/// Apply the `Some` fields of `update`. A blank name is rejected.
pub fn update_properties<C: Container>(container: &mut C, update: &PropertiesUpdate) -> VaultResult<VaultProperties> {
    if let Some(ref name) = update.name {
        if name.trim().is_empty() {
            return Err(VaultError::config("Vault name cannot be empty"));
        }
    }

    if let Some(ref kdf) = update.kdf {
        kdf.validate()?;
    }

    let current = container.crypto_settings();
    let settings = CryptoSettings {
        cipher: update.cipher.unwrap_or(current.cipher),
        kdf: update.kdf.unwrap_or(current.kdf),
        compression: update.compression.unwrap_or(current.compression),
    };
    container.set_crypto_settings(settings);

    let meta = &mut container.document_mut().meta;
    if let Some(ref name) = update.name {
        meta.name = name.clone();
    }
    if let Some(ref description) = update.description {
        meta.description = description.clone();
    }
    if let Some(enabled) = update.recycle_bin_enabled {
        meta.recycle_bin_enabled = enabled;
    }

    log::info!("Updated properties of vault '{}'", meta.name);
    Ok(properties(container))
}

// ─── Master Key ──────────────────────────────────────────────────────────────

/// Replace the credentials after checking `current_password`. The key file is
/// kept, removed or replaced according to `key_file`.
pub fn change_credentials<C: Container>(
    container: &mut C,
    current_password: &str,
    new_password: &str,
    key_file: KeyFileChange,
) -> VaultResult<()> {
    let existing = container.credentials();
    if !existing.password_matches(current_password) {
        return Err(VaultError::decrypt("Current password is incorrect"));
    }

    let key_file = match key_file {
        KeyFileChange::Keep => existing.key_file_bytes(),
        KeyFileChange::Remove => None,
        KeyFileChange::Replace(bytes) => Some(bytes),
    };
    container.set_credentials(Arc::new(Credentials::new(new_password, key_file)));

    log::info!("Master key changed for vault '{}'", container.document().meta.name);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::vault::container::{CreateOptions, SealedContainer};
    use crate::vault::params::{Cipher, Kdf};
    use keeda_core::VaultErrorKind;

    fn container(key_file: Option<Vec<u8>>) -> SealedContainer {
        let opts = CreateOptions {
            crypto: CryptoSettings {
                kdf: Kdf::AesKdf { rounds: 10 },
                ..Default::default()
            },
            default_groups: false,
        };
        SealedContainer::create("Props", Arc::new(Credentials::new("old", key_file)), &opts).unwrap()
    }

    #[test]
    fn update_changes_only_given_fields() {
        let mut c = container(None);
        let props = update_properties(
            &mut c,
            &PropertiesUpdate {
                description: Some("work secrets".into()),
                cipher: Some(Cipher::ChaCha20),
                ..Default::default()
            },
        )
        .unwrap();
        assert_eq!(props.name, "Props");
        assert_eq!(props.description, "work secrets");
        assert_eq!(props.cipher, Cipher::ChaCha20);
        assert_eq!(props.kdf, Kdf::AesKdf { rounds: 10 });

        // the new cipher is used on the next save
        let bytes = c.save().unwrap();
        let back = SealedContainer::load(&bytes, c.credentials()).unwrap();
        assert_eq!(back.crypto_settings().cipher, Cipher::ChaCha20);
        assert_eq!(back.document().meta.description, "work secrets");
    }

    #[test]
    fn blank_name_is_rejected() {
        let mut c = container(None);
        let err = update_properties(
            &mut c,
            &PropertiesUpdate {
                name: Some("  ".into()),
                ..Default::default()
            },
        )
        .unwrap_err();
        assert_eq!(err.kind, VaultErrorKind::Config);
        assert_eq!(properties(&c).name, "Props");
    }

    // ── Credentials ─────────────────────────────────────────────────────

    #[test]
    fn change_password_keeps_key_file() {
        let mut c = container(Some(b"key".to_vec()));
        change_credentials(&mut c, "old", "new", KeyFileChange::Keep).unwrap();
        let bytes = c.save().unwrap();

        assert!(SealedContainer::load(&bytes, Arc::new(Credentials::new("new", Some(b"key".to_vec())))).is_ok());
        assert!(SealedContainer::load(&bytes, Arc::new(Credentials::password_only("new"))).is_err());
        assert!(SealedContainer::load(&bytes, Arc::new(Credentials::new("old", Some(b"key".to_vec())))).is_err());
    }

    #[test]
    fn remove_and_replace_key_file() {
        let mut c = container(Some(b"key".to_vec()));
        change_credentials(&mut c, "old", "pw", KeyFileChange::Remove).unwrap();
        assert!(!c.credentials().has_key_file());

        change_credentials(&mut c, "pw", "pw", KeyFileChange::Replace(b"other".to_vec())).unwrap();
        assert_eq!(c.credentials().key_file_bytes(), Some(b"other".to_vec()));
    }

    #[test]
    fn wrong_current_password_is_rejected() {
        let mut c = container(None);
        let err = change_credentials(&mut c, "nope", "new", KeyFileChange::Keep).unwrap_err();
        assert_eq!(err.kind, VaultErrorKind::DecryptError);
        assert!(c.credentials().password_matches("old"));
    }
}
