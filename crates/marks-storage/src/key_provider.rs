use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use base64::{engine::general_purpose::STANDARD, Engine as _};
use rand::{rngs::OsRng, RngCore};
use thiserror::Error;

/// Environment variable holding a base64 data key; overrides the keychain.
pub const KEY_ENV_VAR: &str = "MARKS_KEY";

const KEY_LEN: usize = 32;
const KEYRING_KEY_ID: &str = "keychain";

/// Key material used for encryption at rest.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeyMaterial {
    /// Identifier for logging (never log key bytes).
    pub id: String,
    /// 256-bit symmetric key.
    pub bytes: [u8; KEY_LEN],
}

impl KeyMaterial {
    /// Fresh random key from the OS RNG.
    pub fn generate(id: impl Into<String>) -> Self {
        let mut bytes = [0u8; KEY_LEN];
        OsRng.fill_bytes(&mut bytes);
        Self {
            id: id.into(),
            bytes,
        }
    }

    /// Parse the standard-base64 form produced by [`KeyMaterial::export`].
    pub fn from_base64(id: impl Into<String>, secret: &str) -> Result<Self, KeyError> {
        let decoded = STANDARD
            .decode(secret.trim())
            .map_err(|e| KeyError::Decode(e.to_string()))?;
        let bytes: [u8; KEY_LEN] = decoded.as_slice().try_into().map_err(|_| {
            KeyError::Decode(format!("expected {KEY_LEN} bytes, got {}", decoded.len()))
        })?;
        Ok(Self {
            id: id.into(),
            bytes,
        })
    }

    /// Base64 form suitable for `MARKS_KEY` on another machine.
    pub fn export(&self) -> String {
        STANDARD.encode(self.bytes)
    }
}

#[derive(Debug, Error)]
pub enum KeyError {
    #[error("keyring error: {0}")]
    Keyring(String),
    #[error("decode error: {0}")]
    Decode(String),
    #[error("generation error: {0}")]
    Generation(String),
    #[error("no data key available ({0})")]
    Missing(String),
}

/// Provides access to the data key (OS keychain in production; memory in tests).
#[async_trait]
pub trait KeyProvider: Send + Sync {
    /// Existing key only. Reading must never mint a new key.
    async fn get(&self) -> Result<KeyMaterial, KeyError>;

    /// Existing key, or a freshly generated one persisted for next time.
    async fn get_or_create(&self) -> Result<KeyMaterial, KeyError>;
}

#[async_trait]
impl<K: KeyProvider + ?Sized> KeyProvider for Box<K> {
    async fn get(&self) -> Result<KeyMaterial, KeyError> {
        (**self).get().await
    }

    async fn get_or_create(&self) -> Result<KeyMaterial, KeyError> {
        (**self).get_or_create().await
    }
}

/// OS keyring-backed provider. Uses the `keyring` crate to store the key.
pub struct KeyringProvider {
    service: String,
    account: String,
}

impl KeyringProvider {
    pub fn new(service: impl Into<String>, account: impl Into<String>) -> Self {
        Self {
            service: service.into(),
            account: account.into(),
        }
    }

    fn entry(&self) -> Result<keyring::Entry, KeyError> {
        keyring::Entry::new(&self.service, &self.account)
            .map_err(|e| KeyError::Keyring(e.to_string()))
    }
}

#[async_trait]
impl KeyProvider for KeyringProvider {
    async fn get(&self) -> Result<KeyMaterial, KeyError> {
        // Keyring operations are synchronous and may prompt the user to unlock.
        match self.entry()?.get_password() {
            Ok(secret) => KeyMaterial::from_base64(KEYRING_KEY_ID, &secret),
            Err(keyring::Error::NoEntry) => Err(KeyError::Missing(format!(
                "keychain entry {}/{} is empty; set {KEY_ENV_VAR} to the exported key",
                self.service, self.account
            ))),
            Err(err) => Err(KeyError::Keyring(err.to_string())),
        }
    }

    async fn get_or_create(&self) -> Result<KeyMaterial, KeyError> {
        let entry = self.entry()?;
        match entry.get_password() {
            Ok(secret) => KeyMaterial::from_base64(KEYRING_KEY_ID, &secret),
            // Only mint a key when the entry is really absent, never on a locked keychain.
            Err(keyring::Error::NoEntry) => {
                let material = KeyMaterial::generate(KEYRING_KEY_ID);
                entry
                    .set_password(&material.export())
                    .map_err(|e| KeyError::Keyring(e.to_string()))?;
                // A backend that forgets the secret would leave the store unreadable.
                verify_persisted(&material, self.entry()?.get_password())?;
                Ok(material)
            }
            Err(err) => Err(KeyError::Keyring(err.to_string())),
        }
    }
}

/// Compare a freshly stored key with what a new entry handle reads back.
fn verify_persisted(
    written: &KeyMaterial,
    read_back: Result<String, keyring::Error>,
) -> Result<(), KeyError> {
    let secret = read_back.map_err(|e| {
        KeyError::Keyring(format!("stored key could not be read back: {e}"))
    })?;
    if secret.trim() != written.export() {
        return Err(KeyError::Keyring(
            "stored key does not match the key read back".to_string(),
        ));
    }
    Ok(())
}

/// Fixed key supplied out of band, typically through `MARKS_KEY`.
#[derive(Debug, Clone)]
pub struct StaticKeyProvider {
    material: KeyMaterial,
}

impl StaticKeyProvider {
    pub fn from_base64(secret: &str) -> Result<Self, KeyError> {
        Ok(Self {
            material: KeyMaterial::from_base64("static", secret)?,
        })
    }

    /// `Ok(None)` when the variable is unset.
    pub fn from_env() -> Result<Option<Self>, KeyError> {
        match std::env::var(KEY_ENV_VAR) {
            Ok(secret) => Self::from_base64(&secret).map(Some),
            Err(_) => Ok(None),
        }
    }
}

#[async_trait]
impl KeyProvider for StaticKeyProvider {
    async fn get(&self) -> Result<KeyMaterial, KeyError> {
        Ok(self.material.clone())
    }

    async fn get_or_create(&self) -> Result<KeyMaterial, KeyError> {
        Ok(self.material.clone())
    }
}

/// In-memory key provider for tests and ephemeral sessions.
#[derive(Debug, Default, Clone)]
pub struct InMemoryKeyProvider {
    inner: Arc<Mutex<Option<KeyMaterial>>>,
}

#[async_trait]
impl KeyProvider for InMemoryKeyProvider {
    async fn get(&self) -> Result<KeyMaterial, KeyError> {
        let slot = self
            .inner
            .lock()
            .map_err(|err| KeyError::Generation(format!("lock poisoned: {err}")))?;
        slot.clone()
            .ok_or_else(|| KeyError::Missing("in-memory key not generated".to_string()))
    }

    async fn get_or_create(&self) -> Result<KeyMaterial, KeyError> {
        let mut slot = self
            .inner
            .lock()
            .map_err(|err| KeyError::Generation(format!("lock poisoned: {err}")))?;
        Ok(slot
            .get_or_insert_with(|| KeyMaterial::generate("memory"))
            .clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn memory_provider_returns_same_key() {
        let provider = InMemoryKeyProvider::default();
        let first = provider.get_or_create().await.unwrap();
        let second = provider.get().await.unwrap();

        assert_eq!(first.bytes, second.bytes);
        assert_eq!(first.id, second.id);
    }

    #[tokio::test]
    async fn memory_provider_get_does_not_generate() {
        let provider = InMemoryKeyProvider::default();
        let err = provider.get().await.expect_err("no key yet");
        assert!(matches!(err, KeyError::Missing(_)));
    }

    #[tokio::test]
    async fn static_provider_round_trips_exported_key() {
        let original = KeyMaterial::generate("test");
        let provider = StaticKeyProvider::from_base64(&original.export()).expect("decode");
        let material = provider.get().await.expect("get");

        assert_eq!(material.bytes, original.bytes);
        assert_eq!(material.id, "static");
    }

    #[test]
    fn read_back_must_return_the_written_key() {
        let material = KeyMaterial::generate("test");

        verify_persisted(&material, Ok(material.export())).expect("matching key");

        let err = verify_persisted(&material, Err(keyring::Error::NoEntry))
            .expect_err("forgotten key");
        assert!(matches!(err, KeyError::Keyring(_)));

        let other = KeyMaterial::generate("other");
        let err = verify_persisted(&material, Ok(other.export())).expect_err("different key");
        assert!(matches!(err, KeyError::Keyring(_)));
    }

    #[tokio::test]
    async fn non_persistent_keyring_fails_instead_of_minting() {
        // Mock entries never share state, like a backend that drops secrets on exit.
        keyring::set_default_credential_builder(keyring::mock::default_credential_builder());
        let provider = KeyringProvider::new("marks-test", "volatile-key");

        let err = provider
            .get_or_create()
            .await
            .expect_err("key must not be handed out");
        assert!(matches!(err, KeyError::Keyring(_)));
    }

    #[test]
    fn decode_rejects_wrong_length() {
        let err = KeyMaterial::from_base64("test", "abcd").expect_err("should reject wrong length");
        assert!(matches!(err, KeyError::Decode(_)));
    }
}
