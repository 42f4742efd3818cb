mod provider;
mod record_store;

pub use provider::{EncryptionProvider, InMemoryProvider, ProviderError};
pub use record_store::{EncryptedStore, StoreError};
