// ── keeda-vault / container ────────────────────────────────────────────────────
//
// The encrypted container: a `Container` trait describing what the engine
// needs from a document store, and `SealedContainer`, the concrete on-disk
// format.
//
// Layout (little endian):
//
//   "KDVX" | version u16 | header_len u32 | header (JSON) | HMAC-SHA256(header)
//          | AEAD ciphertext of the (optionally gzipped) document, AAD = header

use flate2::read::GzDecoder;
use flate2::write::GzEncoder;
use serde::{Deserialize, Serialize};
use std::io::{Read, Write};
use std::sync::Arc;
use uuid::Uuid;

use keeda_core::{VaultError, VaultResult};

use super::crypto::{self, Credentials, KEY_LEN, MAC_LEN, NONCE_LEN};
use super::document::{GroupNode, VaultDocument};
use super::params::{Cipher, Compression, Kdf, KdfParameters};
use super::types::*;

pub const MAGIC: &[u8; 4] = b"KDVX";
pub const FORMAT_VERSION: u16 = 1;

const PREAMBLE_LEN: usize = 4 + 2 + 4;
const MAX_HEADER_LEN: usize = 64 * 1024;

// ─── Trait ────────────────────────────────────────────────────────────────────

/// Cipher, KDF and compression used on the next save.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CryptoSettings {
    pub cipher: Cipher,
    pub kdf: Kdf,
    pub compression: Compression,
}

/// Options for a brand-new vault.
#[derive(Debug, Clone)]
pub struct CreateOptions {
    pub crypto: CryptoSettings,
    /// Seed the conventional top-level groups
    pub default_groups: bool,
}

impl Default for CreateOptions {
    fn default() -> Self {
        Self {
            crypto: CryptoSettings::default(),
            default_groups: true,
        }
    }
}

/// An encrypted document the engine can load, mutate and serialize.
pub trait Container: Send + Sync + Sized {
    /// Decrypt and parse; wrong credentials or tampering give `DecryptError`.
    fn load(bytes: &[u8], credentials: Arc<Credentials>) -> VaultResult<Self>;

    fn create(name: &str, credentials: Arc<Credentials>, options: &CreateOptions) -> VaultResult<Self>;

    /// Serialize and encrypt with fresh randomness.
    fn save(&self) -> VaultResult<Vec<u8>>;

    fn document(&self) -> &VaultDocument;

    fn document_mut(&mut self) -> &mut VaultDocument;

    fn credentials(&self) -> Arc<Credentials>;

    fn set_credentials(&mut self, credentials: Arc<Credentials>);

    fn crypto_settings(&self) -> CryptoSettings;

    fn set_crypto_settings(&mut self, settings: CryptoSettings);
}

// ─── Sealed Container ─────────────────────────────────────────────────────────

#[derive(Debug, Serialize, Deserialize)]
struct ContainerHeader {
    cipher: Uuid,
    compression: Compression,
    #[serde(with = "super::params::b64_bytes")]
    master_seed: Vec<u8>,
    #[serde(with = "super::params::b64_bytes")]
    nonce: Vec<u8>,
    kdf_parameters: KdfParameters,
}

#[derive(Debug, Clone)]
pub struct SealedContainer {
    document: VaultDocument,
    credentials: Arc<Credentials>,
    settings: CryptoSettings,
}

impl SealedContainer {
    fn split(bytes: &[u8]) -> VaultResult<(&[u8], &[u8], &[u8])> {
        if bytes.len() < PREAMBLE_LEN || &bytes[..4] != MAGIC {
            return Err(VaultError::unsupported("Not a KeedaVault file"));
        }
        let version = u16::from_le_bytes([bytes[4], bytes[5]]);
        if version != FORMAT_VERSION {
            return Err(VaultError::unsupported(format!("Unsupported format version {}", version)));
        }
        let header_len = u32::from_le_bytes([bytes[6], bytes[7], bytes[8], bytes[9]]) as usize;
        if header_len > MAX_HEADER_LEN || bytes.len() < PREAMBLE_LEN + header_len + MAC_LEN {
            return Err(VaultError::unsupported("Truncated or corrupted header"));
        }
        let header_end = PREAMBLE_LEN + header_len;
        let header = &bytes[PREAMBLE_LEN..header_end];
        let mac = &bytes[header_end..header_end + MAC_LEN];
        let payload = &bytes[header_end + MAC_LEN..];
        Ok((header, mac, payload))
    }

    fn compress(compression: Compression, data: &[u8]) -> VaultResult<Vec<u8>> {
        match compression {
            Compression::None => Ok(data.to_vec()),
            Compression::GZip => {
                let mut encoder = GzEncoder::new(Vec::new(), flate2::Compression::default());
                encoder.write_all(data)?;
                Ok(encoder.finish()?)
            }
        }
    }

    fn decompress(compression: Compression, data: &[u8]) -> VaultResult<Vec<u8>> {
        match compression {
            Compression::None => Ok(data.to_vec()),
            Compression::GZip => {
                let mut out = Vec::new();
                GzDecoder::new(data)
                    .read_to_end(&mut out)
                    .map_err(|e| VaultError::unsupported(format!("Corrupted payload: {}", e)))?;
                Ok(out)
            }
        }
    }

    fn seed_default_groups(document: &mut VaultDocument) -> VaultResult<()> {
        let root = document.root();
        let now = document.meta.created;
        for name in DEFAULT_GROUPS {
            let mut group = GroupNode::new(name, DEFAULT_GROUP_ICON, now);
            group.enable_searching = Some(true);
            document.insert_group(&root, group)?;
        }
        Ok(())
    }
}

impl Container for SealedContainer {
    fn load(bytes: &[u8], credentials: Arc<Credentials>) -> VaultResult<Self> {
        let (header_bytes, mac, payload) = Self::split(bytes)?;
        let header: ContainerHeader = serde_json::from_slice(header_bytes)
            .map_err(|e| VaultError::unsupported(format!("Malformed header: {}", e)))?;

        let cipher = Cipher::from_uuid(&header.cipher)?;
        let (kdf, salt) = Kdf::from_parameters(&header.kdf_parameters)?;
        if header.master_seed.len() != KEY_LEN || header.nonce.len() != NONCE_LEN {
            return Err(VaultError::unsupported("Malformed header seeds"));
        }

        let keys = crypto::derive_keys(&credentials, &kdf, &salt, &header.master_seed)?;
        crypto::verify_header_mac(&keys.hmac_key, header_bytes, mac)?;
        let plain = crypto::open(cipher, &keys.cipher_key, &header.nonce, payload, header_bytes)?;
        let json = Self::decompress(header.compression, &plain)?;

        let mut document: VaultDocument = serde_json::from_slice(&json)
            .map_err(|e| VaultError::unsupported(format!("Malformed document: {}", e)))?;
        document.reindex()?;

        log::debug!(
            "Loaded vault '{}' ({} groups, {} entries)",
            document.meta.name,
            document.group_count(),
            document.entry_count()
        );

        Ok(Self {
            document,
            credentials,
            settings: CryptoSettings {
                cipher,
                kdf,
                compression: header.compression,
            },
        })
    }

    fn create(name: &str, credentials: Arc<Credentials>, options: &CreateOptions) -> VaultResult<Self> {
        let mut document = VaultDocument::new(name, chrono::Utc::now());
        if options.default_groups {
            Self::seed_default_groups(&mut document)?;
        }
        Ok(Self {
            document,
            credentials,
            settings: options.crypto,
        })
    }

    fn save(&self) -> VaultResult<Vec<u8>> {
        let master_seed = crypto::random_bytes(KEY_LEN);
        let salt = crypto::random_bytes(self.settings.kdf.salt_len());
        let nonce = crypto::random_bytes(NONCE_LEN);

        let header = ContainerHeader {
            cipher: self.settings.cipher.uuid(),
            compression: self.settings.compression,
            master_seed,
            nonce,
            kdf_parameters: self.settings.kdf.to_parameters(&salt),
        };
        let header_bytes = serde_json::to_vec(&header)?;
        let header_len = u32::try_from(header_bytes.len())
            .map_err(|_| VaultError::serialization("Header too large"))?;

        let keys = crypto::derive_keys(&self.credentials, &self.settings.kdf, &salt, &header.master_seed)?;
        let mac = crypto::header_mac(&keys.hmac_key, &header_bytes)?;

        let json = serde_json::to_vec(&self.document)?;
        let body = Self::compress(self.settings.compression, &json)?;
        let sealed = crypto::seal(self.settings.cipher, &keys.cipher_key, &header.nonce, &body, &header_bytes)?;

        let mut out = Vec::with_capacity(PREAMBLE_LEN + header_bytes.len() + MAC_LEN + sealed.len());
        out.extend_from_slice(MAGIC);
        out.extend_from_slice(&FORMAT_VERSION.to_le_bytes());
        out.extend_from_slice(&header_len.to_le_bytes());
        out.extend_from_slice(&header_bytes);
        out.extend_from_slice(&mac);
        out.extend_from_slice(&sealed);
        Ok(out)
    }

    fn document(&self) -> &VaultDocument {
        &self.document
    }

    fn document_mut(&mut self) -> &mut VaultDocument {
        &mut self.document
    }

    fn credentials(&self) -> Arc<Credentials> {
        Arc::clone(&self.credentials)
    }

    fn set_credentials(&mut self, credentials: Arc<Credentials>) {
        self.credentials = credentials;
    }

    fn crypto_settings(&self) -> CryptoSettings {
        self.settings
    }

    fn set_crypto_settings(&mut self, settings: CryptoSettings) {
        self.settings = settings;
    }
}
