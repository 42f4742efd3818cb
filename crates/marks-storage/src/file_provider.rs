use std::{
    fs::{self, File},
    io::{Read, Write},
    path::Path,
};

use aes_gcm::{
    aead::{Aead, AeadCore, KeyInit, OsRng},
    Aes256Gcm, Nonce,
};
use async_trait::async_trait;
use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine as _};
use marks_core::storage::{EncryptionProvider, ProviderError};
use serde::{Deserialize, Serialize};
use tempfile::NamedTempFile;
use tracing::{debug, instrument};

use crate::key_provider::{KeyMaterial, KeyProvider};

const BLOB_VERSION: u8 = 1;

/// AES-GCM encrypted file provider implementing the shared `EncryptionProvider` contract.
/// The file on disk is a small JSON envelope, so it diffs and commits as text.
pub struct AesGcmFileProvider<K: KeyProvider> {
    key_provider: K,
}

impl<K: KeyProvider> AesGcmFileProvider<K> {
    pub fn new(key_provider: K) -> Self {
        Self { key_provider }
    }
}

#[derive(Debug, Serialize, Deserialize)]
struct StoredBlob {
    version: u8,
    nonce: String,
    ciphertext: String,
}

#[async_trait]
impl<K: KeyProvider> EncryptionProvider for AesGcmFileProvider<K> {
    fn exists(&self, path: &Path) -> bool {
        path.exists()
    }

    #[instrument(skip_all, fields(path = %path.display()))]
    async fn decrypt(&self, path: &Path) -> Result<Vec<u8>, ProviderError> {
        let blob = read_blob(path)?;
        if blob.version != BLOB_VERSION {
            return Err(decrypt_err(format!(
                "unsupported envelope version {}",
                blob.version
            )));
        }

        let key_material = self
            .key_provider
            .get()
            .await
            .map_err(|e| decrypt_err(format!("key provider: {e}")))?;
        debug!(key_id = %key_material.id, "decrypting store");
        let cipher = build_cipher(&key_material).map_err(decrypt_err)?;

        let nonce_bytes = URL_SAFE_NO_PAD
            .decode(blob.nonce)
            .map_err(|e| decrypt_err(format!("nonce decode failed: {e}")))?;
        if nonce_bytes.len() != 12 {
            return Err(decrypt_err(format!(
                "expected 12 byte nonce, got {}",
                nonce_bytes.len()
            )));
        }
        let nonce = Nonce::from_slice(&nonce_bytes);

        let ciphertext = URL_SAFE_NO_PAD
            .decode(blob.ciphertext)
            .map_err(|e| decrypt_err(format!("ciphertext decode failed: {e}")))?;

        cipher
            .decrypt(nonce, ciphertext.as_ref())
            .map_err(|_| decrypt_err("authentication failed (wrong key or tampered file)"))
    }

    #[instrument(skip_all, fields(path = %path.display(), bytes = plaintext.len()))]
    async fn encrypt_and_write(
        &self,
        path: &Path,
        plaintext: &[u8],
    ) -> Result<(), ProviderError> {
        let key_material = self
            .key_provider
            .get_or_create()
            .await
            .map_err(|e| encrypt_err(format!("key provider: {e}")))?;
        debug!(key_id = %key_material.id, "encrypting store");

        let cipher = build_cipher(&key_material).map_err(encrypt_err)?;
        let nonce = Aes256Gcm::generate_nonce(&mut OsRng);
        let ciphertext = cipher
            .encrypt(&nonce, plaintext)
            .map_err(|e| encrypt_err(format!("encrypt failed: {e}")))?;

        let blob = StoredBlob {
            version: BLOB_VERSION,
            nonce: URL_SAFE_NO_PAD.encode(nonce.as_slice()),
            ciphertext: URL_SAFE_NO_PAD.encode(ciphertext),
        };
        write_blob(path, &blob)
    }
}

/// Temp file in the target directory, then rename over the old file.
fn write_blob(path: &Path, blob: &StoredBlob) -> Result<(), ProviderError> {
    let parent = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        Some(_) => Path::new("."),
        None => {
            return Err(ProviderError::Io {
                reason: "invalid storage path".to_string(),
            })
        }
    };
    fs::create_dir_all(parent).map_err(io_err)?;

    let mut tmp = NamedTempFile::new_in(parent).map_err(io_err)?;
    let mut json = serde_json::to_vec_pretty(blob).map_err(io_err)?;
    json.push(b'\n');
    tmp.write_all(&json).map_err(io_err)?;
    tmp.as_file().sync_all().map_err(io_err)?;
    tmp.persist(path).map_err(|e| io_err(e.error))?;
    Ok(())
}

fn read_blob(path: &Path) -> Result<StoredBlob, ProviderError> {
    let mut file = File::open(path).map_err(|err| {
        if err.kind() == std::io::ErrorKind::NotFound {
            ProviderError::NotFound {
                path: path.display().to_string(),
            }
        } else {
            io_err(err)
        }
    })?;

    let mut buf = Vec::new();
    file.read_to_end(&mut buf).map_err(io_err)?;
    serde_json::from_slice(&buf).map_err(|e| decrypt_err(format!("not an encrypted store: {e}")))
}

fn build_cipher(material: &KeyMaterial) -> Result<Aes256Gcm, String> {
    Aes256Gcm::new_from_slice(&material.bytes).map_err(|e| format!("cipher init failed: {e}"))
}

fn decrypt_err(reason: impl Into<String>) -> ProviderError {
    ProviderError::Decrypt {
        reason: reason.into(),
    }
}

fn encrypt_err(reason: impl Into<String>) -> ProviderError {
    ProviderError::Encrypt {
        reason: reason.into(),
    }
}

fn io_err<E: ToString>(err: E) -> ProviderError {
    ProviderError::Io {
        reason: err.to_string(),
    }
}
