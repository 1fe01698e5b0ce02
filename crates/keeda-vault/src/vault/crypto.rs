// ── keeda-vault / crypto ───────────────────────────────────────────────────────
//
// Credentials, composite key construction, key derivation (Argon2d/id,
// AES-KDF) and authenticated payload sealing (AES-256-GCM, ChaCha20-Poly1305).

use aes::cipher::{generic_array::GenericArray, BlockEncrypt, KeyInit as BlockKeyInit};
use aes::Aes256;
use aes_gcm::aead::{Aead, KeyInit, Payload};
use aes_gcm::Aes256Gcm;
use argon2::{Algorithm, Argon2, Params, Version};
use chacha20poly1305::ChaCha20Poly1305;
use hmac::{Hmac, Mac};
use rand::rngs::OsRng;
use rand::RngCore;
use secrecy::{ExposeSecret, SecretString, SecretVec};
use sha2::{Digest, Sha256};
use std::fmt;
use zeroize::Zeroizing;

use keeda_core::{VaultError, VaultResult};

use super::params::{Cipher, Kdf};

type HmacSha256 = Hmac<Sha256>;

pub const KEY_LEN: usize = 32;
pub const NONCE_LEN: usize = 12;
pub const MAC_LEN: usize = 32;

// ─── Credentials ──────────────────────────────────────────────────────────────

/// Master password plus optional key file. Both stay wrapped until the
/// composite key is computed.
pub struct Credentials {
    password: SecretString,
    key_file: Option<SecretVec<u8>>,
}

impl Credentials {
    pub fn new(password: impl Into<String>, key_file: Option<Vec<u8>>) -> Self {
        Self {
            password: SecretString::new(password.into()),
            key_file: key_file.map(SecretVec::new),
        }
    }

    pub fn password_only(password: impl Into<String>) -> Self {
        Self::new(password, None)
    }

    pub fn has_key_file(&self) -> bool {
        self.key_file.is_some()
    }

    /// Key-file bytes, used when rebuilding credentials with the same key file.
    pub fn key_file_bytes(&self) -> Option<Vec<u8>> {
        self.key_file.as_ref().map(|k| k.expose_secret().clone())
    }

    /// Check a candidate password against this credential's password.
    pub fn password_matches(&self, candidate: &str) -> bool {
        let a = Sha256::digest(self.password.expose_secret().as_bytes());
        let b = Sha256::digest(candidate.as_bytes());
        a == b
    }

    /// SHA-256( SHA-256(password) ‖ SHA-256(key file) ).
    pub fn composite_key(&self) -> Zeroizing<[u8; KEY_LEN]> {
        let mut hasher = Sha256::new();
        hasher.update(Sha256::digest(self.password.expose_secret().as_bytes()));
        if let Some(ref key_file) = self.key_file {
            hasher.update(Sha256::digest(key_file.expose_secret()));
        }
        Zeroizing::new(hasher.finalize().into())
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("password", &"***")
            .field("key_file", &self.key_file.is_some())
            .finish()
    }
}

/// How a credential change treats the key file.
#[derive(Debug, Clone)]
pub enum KeyFileChange {
    Keep,
    Remove,
    Replace(Vec<u8>),
}

// ─── Key Derivation ───────────────────────────────────────────────────────────

/// Keys derived for one sealed payload.
pub struct DerivedKeys {
    pub cipher_key: Zeroizing<[u8; KEY_LEN]>,
    pub hmac_key: Zeroizing<[u8; KEY_LEN]>,
}

/// Run the KDF over the composite key, then bind the result to the master seed.
pub fn derive_keys(
    credentials: &Credentials,
    kdf: &Kdf,
    salt: &[u8],
    master_seed: &[u8],
) -> VaultResult<DerivedKeys> {
    let composite = credentials.composite_key();
    let transformed = transform_key(&composite, kdf, salt)?;

    let mut cipher_hasher = Sha256::new();
    cipher_hasher.update(master_seed);
    cipher_hasher.update(transformed.as_ref());
    let cipher_key: [u8; KEY_LEN] = cipher_hasher.finalize().into();

    let mut hmac_hasher = Sha256::new();
    hmac_hasher.update(master_seed);
    hmac_hasher.update(transformed.as_ref());
    hmac_hasher.update([0x01]);
    let hmac_key: [u8; KEY_LEN] = hmac_hasher.finalize().into();

    Ok(DerivedKeys {
        cipher_key: Zeroizing::new(cipher_key),
        hmac_key: Zeroizing::new(hmac_key),
    })
}

fn transform_key(
    composite: &[u8; KEY_LEN],
    kdf: &Kdf,
    salt: &[u8],
) -> VaultResult<Zeroizing<[u8; KEY_LEN]>> {
    match *kdf {
        Kdf::Argon2d { iterations, memory, parallelism } => {
            argon2_transform(Algorithm::Argon2d, composite, salt, iterations, memory, parallelism)
        }
        Kdf::Argon2id { iterations, memory, parallelism } => {
            argon2_transform(Algorithm::Argon2id, composite, salt, iterations, memory, parallelism)
        }
        Kdf::AesKdf { rounds } => aes_kdf_transform(composite, salt, rounds),
    }
}

fn argon2_transform(
    algorithm: Algorithm,
    composite: &[u8; KEY_LEN],
    salt: &[u8],
    iterations: u64,
    memory: u64,
    parallelism: u32,
) -> VaultResult<Zeroizing<[u8; KEY_LEN]>> {
    let m_cost = u32::try_from(memory / 1024)
        .map_err(|_| VaultError::crypto("Argon2 memory parameter out of range"))?;
    let t_cost = u32::try_from(iterations)
        .map_err(|_| VaultError::crypto("Argon2 iteration count out of range"))?;

    let params = Params::new(m_cost, t_cost, parallelism, Some(KEY_LEN))
        .map_err(|e| VaultError::crypto(format!("Invalid Argon2 parameters: {}", e)))?;
    let argon2 = Argon2::new(algorithm, Version::V0x13, params);

    let mut output = Zeroizing::new([0u8; KEY_LEN]);
    argon2
        .hash_password_into(composite, salt, output.as_mut())
        .map_err(|e| VaultError::crypto(format!("Argon2 failed: {}", e)))?;
    Ok(output)
}

/// Encrypt the composite key `rounds` times with AES-256 keyed by the seed,
/// then hash.
fn aes_kdf_transform(
    composite: &[u8; KEY_LEN],
    seed: &[u8],
    rounds: u64,
) -> VaultResult<Zeroizing<[u8; KEY_LEN]>> {
    if seed.len() != KEY_LEN {
        return Err(VaultError::crypto("AES-KDF seed must be 32 bytes"));
    }
    let cipher = Aes256::new(GenericArray::from_slice(seed));

    let mut block = Zeroizing::new(*composite);
    for _ in 0..rounds {
        let (left, right) = block.split_at_mut(16);
        cipher.encrypt_block(GenericArray::from_mut_slice(left));
        cipher.encrypt_block(GenericArray::from_mut_slice(right));
    }

    let digest: [u8; KEY_LEN] = Sha256::digest(block.as_ref()).into();
    Ok(Zeroizing::new(digest))
}

// ─── Sealing ──────────────────────────────────────────────────────────────────

/// Encrypt `plaintext`, authenticating `aad` alongside it.
pub fn seal(
    cipher: Cipher,
    key: &[u8; KEY_LEN],
    nonce: &[u8],
    plaintext: &[u8],
    aad: &[u8],
) -> VaultResult<Vec<u8>> {
    if nonce.len() != NONCE_LEN {
        return Err(VaultError::crypto("Invalid nonce length"));
    }
    let payload = Payload { msg: plaintext, aad };
    match cipher {
        Cipher::Aes => {
            let aead = Aes256Gcm::new_from_slice(key)
                .map_err(|e| VaultError::crypto(format!("Invalid key: {}", e)))?;
            aead.encrypt(aes_gcm::Nonce::from_slice(nonce), payload)
                .map_err(|_| VaultError::crypto("Encryption failed"))
        }
        Cipher::ChaCha20 => {
            let aead = ChaCha20Poly1305::new_from_slice(key)
                .map_err(|e| VaultError::crypto(format!("Invalid key: {}", e)))?;
            aead.encrypt(chacha20poly1305::Nonce::from_slice(nonce), payload)
                .map_err(|_| VaultError::crypto("Encryption failed"))
        }
    }
}

/// Decrypt and authenticate. Any tag mismatch is a `DecryptError`.
pub fn open(
    cipher: Cipher,
    key: &[u8; KEY_LEN],
    nonce: &[u8],
    ciphertext: &[u8],
    aad: &[u8],
) -> VaultResult<Zeroizing<Vec<u8>>> {
    if nonce.len() != NONCE_LEN {
        return Err(VaultError::decrypt("Invalid nonce length"));
    }
    let payload = Payload { msg: ciphertext, aad };
    let plain = match cipher {
        Cipher::Aes => {
            let aead = Aes256Gcm::new_from_slice(key)
                .map_err(|e| VaultError::crypto(format!("Invalid key: {}", e)))?;
            aead.decrypt(aes_gcm::Nonce::from_slice(nonce), payload)
        }
        Cipher::ChaCha20 => {
            let aead = ChaCha20Poly1305::new_from_slice(key)
                .map_err(|e| VaultError::crypto(format!("Invalid key: {}", e)))?;
            aead.decrypt(chacha20poly1305::Nonce::from_slice(nonce), payload)
        }
    }
    .map_err(|_| VaultError::decrypt("Payload authentication failed"))?;
    Ok(Zeroizing::new(plain))
}

/// HMAC-SHA256 over the serialized header.
pub fn header_mac(hmac_key: &[u8; KEY_LEN], header: &[u8]) -> VaultResult<[u8; MAC_LEN]> {
    let mut mac = <HmacSha256 as Mac>::new_from_slice(hmac_key)
        .map_err(|e| VaultError::crypto(format!("Invalid HMAC key: {}", e)))?;
    mac.update(header);
    Ok(mac.finalize().into_bytes().into())
}

/// Constant-time check of a header MAC.
pub fn verify_header_mac(hmac_key: &[u8; KEY_LEN], header: &[u8], expected: &[u8]) -> VaultResult<()> {
    let mut mac = <HmacSha256 as Mac>::new_from_slice(hmac_key)
        .map_err(|e| VaultError::crypto(format!("Invalid HMAC key: {}", e)))?;
    mac.update(header);
    mac.verify_slice(expected)
        .map_err(|_| VaultError::decrypt("Invalid credentials or corrupted header"))
}

pub fn random_bytes(len: usize) -> Vec<u8> {
    let mut buf = vec![0u8; len];
    OsRng.fill_bytes(&mut buf);
    buf
}
