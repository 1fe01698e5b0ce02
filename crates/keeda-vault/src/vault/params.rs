// ── keeda-vault / params ───────────────────────────────────────────────────────
//
// Typed cipher / KDF / compression settings and their total conversion to and
// from the container's native parameter dictionary.

use base64::engine::general_purpose::STANDARD as B64;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use uuid::Uuid;

use keeda_core::{VaultError, VaultResult};

// ─── Identifiers ──────────────────────────────────────────────────────────────

pub const CIPHER_AES256: Uuid = Uuid::from_u128(0x31c1f2e6_bf71_4350_be58_05216afc5aff);
pub const CIPHER_CHACHA20: Uuid = Uuid::from_u128(0xd6038a2b_8b6f_4cb5_a524_339a31dbb59a);

pub const KDF_AES: Uuid = Uuid::from_u128(0xc9d9f39a_628a_4460_bf74_0d08c18a4fea);
pub const KDF_ARGON2D: Uuid = Uuid::from_u128(0xef636ddf_8c29_444b_91f7_a9a403e30a0c);
pub const KDF_ARGON2ID: Uuid = Uuid::from_u128(0x9e298b19_56db_4773_b23d_fc3ec6f0a1e6);

/// Argon2 version 1.3
pub const ARGON2_VERSION: u32 = 0x13;

// Dictionary keys
pub const PARAM_UUID: &str = "$UUID";
pub const PARAM_ITERATIONS: &str = "I";
pub const PARAM_MEMORY: &str = "M";
pub const PARAM_PARALLELISM: &str = "P";
pub const PARAM_ROUNDS: &str = "R";
pub const PARAM_SALT: &str = "S";
pub const PARAM_VERSION: &str = "V";

// ─── Cipher ───────────────────────────────────────────────────────────────────

/// Payload encryption cipher.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum Cipher {
    /// AES-256-GCM
    Aes,
    /// ChaCha20-Poly1305
    ChaCha20,
}

impl Default for Cipher {
    fn default() -> Self {
        Self::ChaCha20
    }
}

impl Cipher {
    pub fn uuid(self) -> Uuid {
        match self {
            Self::Aes => CIPHER_AES256,
            Self::ChaCha20 => CIPHER_CHACHA20,
        }
    }

    pub fn from_uuid(uuid: &Uuid) -> VaultResult<Self> {
        match *uuid {
            CIPHER_AES256 => Ok(Self::Aes),
            CIPHER_CHACHA20 => Ok(Self::ChaCha20),
            other => Err(VaultError::unsupported(format!("Unknown cipher: {}", other))),
        }
    }

    pub fn display_name(self) -> &'static str {
        match self {
            Self::Aes => "AES-256",
            Self::ChaCha20 => "ChaCha20",
        }
    }
}

// ─── Compression ──────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum Compression {
    None,
    GZip,
}

impl Default for Compression {
    fn default() -> Self {
        Self::GZip
    }
}

// ─── KDF ──────────────────────────────────────────────────────────────────────

/// Key derivation function with its cost parameters.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum Kdf {
    /// Argon2d; `memory` in bytes
    Argon2d { iterations: u64, memory: u64, parallelism: u32 },
    /// Argon2id; `memory` in bytes
    Argon2id { iterations: u64, memory: u64, parallelism: u32 },
    /// Legacy AES-KDF
    AesKdf { rounds: u64 },
}

impl Default for Kdf {
    fn default() -> Self {
        Self::Argon2d {
            iterations: 2,
            memory: 64 * 1024 * 1024,
            parallelism: 2,
        }
    }
}

impl Kdf {
    pub fn uuid(&self) -> Uuid {
        match self {
            Self::Argon2d { .. } => KDF_ARGON2D,
            Self::Argon2id { .. } => KDF_ARGON2ID,
            Self::AesKdf { .. } => KDF_AES,
        }
    }

    pub fn display_name(&self) -> &'static str {
        match self {
            Self::Argon2d { .. } => "Argon2d",
            Self::Argon2id { .. } => "Argon2id",
            Self::AesKdf { .. } => "AES-KDF",
        }
    }

    /// Reject cost parameters the derivation would fail on. Argon2 needs at
    /// least 8 KiB of memory per lane.
    pub fn validate(&self) -> VaultResult<()> {
        match *self {
            Self::Argon2d { iterations, memory, parallelism }
            | Self::Argon2id { iterations, memory, parallelism } => {
                if iterations == 0 || u32::try_from(iterations).is_err() {
                    return Err(VaultError::config("Argon2 needs between 1 and 2^32-1 iterations"));
                }
                if parallelism == 0 {
                    return Err(VaultError::config("Argon2 needs at least one lane"));
                }
                let kib = memory / 1024;
                if kib < 8 * u64::from(parallelism) || u32::try_from(kib).is_err() {
                    return Err(VaultError::config(format!(
                        "Argon2 memory of {} bytes is out of range for {} lanes",
                        memory, parallelism
                    )));
                }
            }
            Self::AesKdf { rounds: 0 } => {
                return Err(VaultError::config("AES-KDF needs at least one round"));
            }
            Self::AesKdf { .. } => {}
        }
        Ok(())
    }

    /// Salt / seed length expected by this KDF.
    pub fn salt_len(&self) -> usize {
        32
    }

    /// Encode into the native parameter dictionary.
    pub fn to_parameters(&self, salt: &[u8]) -> KdfParameters {
        let mut params = KdfParameters::new();
        params.insert(PARAM_UUID.to_string(), VariantValue::Bytes(self.uuid().as_bytes().to_vec()));
        params.insert(PARAM_SALT.to_string(), VariantValue::Bytes(salt.to_vec()));
        match *self {
            Self::Argon2d { iterations, memory, parallelism }
            | Self::Argon2id { iterations, memory, parallelism } => {
                params.insert(PARAM_ITERATIONS.to_string(), VariantValue::UInt64(iterations));
                params.insert(PARAM_MEMORY.to_string(), VariantValue::UInt64(memory));
                params.insert(PARAM_PARALLELISM.to_string(), VariantValue::UInt32(parallelism));
                params.insert(PARAM_VERSION.to_string(), VariantValue::UInt32(ARGON2_VERSION));
            }
            Self::AesKdf { rounds } => {
                params.insert(PARAM_ROUNDS.to_string(), VariantValue::UInt64(rounds));
            }
        }
        params
    }

    /// Decode from the native parameter dictionary, returning the KDF and its salt.
    pub fn from_parameters(params: &KdfParameters) -> VaultResult<(Self, Vec<u8>)> {
        let uuid_bytes = get_bytes(params, PARAM_UUID)?;
        let uuid = Uuid::from_slice(uuid_bytes)
            .map_err(|_| VaultError::unsupported("Malformed KDF identifier"))?;
        let salt = get_bytes(params, PARAM_SALT)?.to_vec();

        let kdf = match uuid {
            KDF_ARGON2D | KDF_ARGON2ID => {
                let iterations = get_u64(params, PARAM_ITERATIONS)?;
                let memory = get_u64(params, PARAM_MEMORY)?;
                let parallelism = get_u32(params, PARAM_PARALLELISM)?;
                if let Some(version) = params.get(PARAM_VERSION) {
                    if version != &VariantValue::UInt32(ARGON2_VERSION) {
                        return Err(VaultError::unsupported("Unsupported Argon2 version"));
                    }
                }
                if uuid == KDF_ARGON2D {
                    Self::Argon2d { iterations, memory, parallelism }
                } else {
                    Self::Argon2id { iterations, memory, parallelism }
                }
            }
            KDF_AES => Self::AesKdf {
                rounds: get_u64(params, PARAM_ROUNDS)?,
            },
            other => return Err(VaultError::unsupported(format!("Unknown KDF: {}", other))),
        };
        Ok((kdf, salt))
    }
}

// ─── Variant Dictionary ───────────────────────────────────────────────────────

/// A typed value in the native parameter dictionary.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "type", content = "value")]
pub enum VariantValue {
    UInt32(u32),
    UInt64(u64),
    Bool(bool),
    Int32(i32),
    Int64(i64),
    String(String),
    Bytes(#[serde(with = "b64_bytes")] Vec<u8>),
}

pub type KdfParameters = BTreeMap<String, VariantValue>;

fn missing(key: &str) -> VaultError {
    VaultError::unsupported(format!("Missing or mistyped KDF parameter '{}'", key))
}

fn get_bytes<'a>(params: &'a KdfParameters, key: &str) -> VaultResult<&'a [u8]> {
    match params.get(key) {
        Some(VariantValue::Bytes(b)) => Ok(b.as_slice()),
        _ => Err(missing(key)),
    }
}

fn get_u64(params: &KdfParameters, key: &str) -> VaultResult<u64> {
    match params.get(key) {
        Some(VariantValue::UInt64(v)) => Ok(*v),
        Some(VariantValue::UInt32(v)) => Ok(u64::from(*v)),
        _ => Err(missing(key)),
    }
}

fn get_u32(params: &KdfParameters, key: &str) -> VaultResult<u32> {
    match params.get(key) {
        Some(VariantValue::UInt32(v)) => Ok(*v),
        Some(VariantValue::UInt64(v)) => u32::try_from(*v).map_err(|_| missing(key)),
        _ => Err(missing(key)),
    }
}

pub(crate) mod b64_bytes {
    use super::B64;
    use base64::Engine as _;
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(bytes: &[u8], serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&B64.encode(bytes))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<u8>, D::Error> {
        let s = String::deserialize(deserializer)?;
        B64.decode(s.as_bytes()).map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use keeda_core::VaultErrorKind;

    #[test]
    fn cipher_uuid_conversion_is_total() {
        for cipher in [Cipher::Aes, Cipher::ChaCha20] {
            assert_eq!(Cipher::from_uuid(&cipher.uuid()).unwrap(), cipher);
        }
        let err = Cipher::from_uuid(&Uuid::nil()).unwrap_err();
        assert_eq!(err.kind, VaultErrorKind::UnsupportedFormat);
    }

    #[test]
    fn kdf_cost_parameters_are_validated() {
        assert!(Kdf::default().validate().is_ok());
        assert!(Kdf::AesKdf { rounds: 10 }.validate().is_ok());
        assert!(Kdf::Argon2id { iterations: 1, memory: 64 * 1024, parallelism: 1 }
            .validate()
            .is_ok());

        for bad in [
            Kdf::Argon2id { iterations: 1, memory: 64 * 1024, parallelism: 0 },
            Kdf::Argon2id { iterations: 0, memory: 64 * 1024, parallelism: 1 },
            Kdf::Argon2d { iterations: 1, memory: 0, parallelism: 1 },
            Kdf::Argon2d { iterations: 1, memory: 16 * 1024, parallelism: 4 },
            Kdf::AesKdf { rounds: 0 },
        ] {
            let err = bad.validate().unwrap_err();
            assert_eq!(err.kind, VaultErrorKind::Config, "{:?}", bad);
        }
    }

    #[test]
    fn argon2id_parameters_decode() {
        let kdf = Kdf::Argon2id { iterations: 3, memory: 1 << 20, parallelism: 4 };
        let params = kdf.to_parameters(&[7u8; 32]);
        assert_eq!(params.get(PARAM_VERSION), Some(&VariantValue::UInt32(ARGON2_VERSION)));
        let (back, salt) = Kdf::from_parameters(&params).unwrap();
        assert_eq!(back, kdf);
        assert_eq!(salt, vec![7u8; 32]);
    }

    #[test]
    fn aes_kdf_accepts_u32_rounds() {
        let mut params = Kdf::AesKdf { rounds: 10 }.to_parameters(&[1u8; 32]);
        params.insert(PARAM_ROUNDS.to_string(), VariantValue::UInt32(6000));
        let (kdf, _) = Kdf::from_parameters(&params).unwrap();
        assert_eq!(kdf, Kdf::AesKdf { rounds: 6000 });
    }

    #[test]
    fn missing_parameter_is_rejected() {
        let mut params = Kdf::default().to_parameters(&[0u8; 32]);
        params.remove(PARAM_MEMORY);
        let err = Kdf::from_parameters(&params).unwrap_err();
        assert_eq!(err.kind, VaultErrorKind::UnsupportedFormat);
        assert!(err.message.contains("'M'"));
    }

    #[test]
    fn unknown_kdf_is_rejected() {
        let mut params = Kdf::default().to_parameters(&[0u8; 32]);
        params.insert(PARAM_UUID.to_string(), VariantValue::Bytes(vec![0u8; 16]));
        assert!(Kdf::from_parameters(&params).is_err());
    }

    #[test]
    fn dictionary_bytes_are_base64_in_json() {
        let value = VariantValue::Bytes(vec![1, 2, 3]);
        let json = serde_json::to_string(&value).unwrap();
        assert_eq!(json, r#"{"type":"Bytes","value":"AQID"}"#);
    }
}
