//! Concrete encryption providers for the bookmark store.
//! Uses AES-GCM with keys sourced from the OS keyring, the environment, or test doubles.

pub mod file_provider;
pub mod key_provider;
