//! Core abstractions for marks: the bookmark model, the encryption provider
//! contract and the encrypted record store built on top of it.
//! Concrete ciphers and key sources live in `marks-storage`.

pub mod bookmarks;
pub mod storage;
