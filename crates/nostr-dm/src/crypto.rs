// Copyright (c) 2022-2023 Yuki Kishimoto
// Copyright (c) 2023-2025 Rust Nostr Developers
// Distributed under the MIT software license

//! Encryption provider

use std::any::Any;
use std::fmt::{self, Debug};
use std::sync::Arc;

use nostr::nips::nip04;
use nostr::nips::nip59::UnwrappedGift;
use nostr::util::BoxedFuture;
use nostr::{Event, EventBuilder, Keys, PublicKey, Tag, UnsignedEvent};

/// Encryption error
#[derive(Debug)]
pub enum EncryptionError {
    /// An error happened in the underlying backend.
    Backend(Box<dyn std::error::Error + Send + Sync>),
}

impl std::error::Error for EncryptionError {}

impl fmt::Display for EncryptionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Backend(e) => fmt::Display::fmt(e, f),
        }
    }
}

impl EncryptionError {
    /// Create a new backend error
    ///
    /// Shorthand for `Self::Backend(Box::new(error))`.
    #[inline]
    pub fn backend<E>(error: E) -> Self
    where
        E: Into<Box<dyn std::error::Error + Send + Sync>>,
    {
        Self::Backend(error.into())
    }
}

/// Encryption provider
///
/// All the methods are side-effect free and may fail.
pub trait EncryptionProvider: Any + Debug + Send + Sync {
    /// Encrypt a plaintext with the legacy scheme (NIP-04)
    fn encrypt_legacy(
        &self,
        keys: &Keys,
        recipient: &PublicKey,
        plaintext: &str,
    ) -> Result<String, EncryptionError>;

    /// Decrypt a legacy ciphertext (NIP-04)
    ///
    /// `counterpart` is the other party of the exchange (author or recipient).
    fn decrypt_legacy(
        &self,
        keys: &Keys,
        counterpart: &PublicKey,
        ciphertext: &str,
    ) -> Result<String, EncryptionError>;

    /// Seal a rumor and wrap it for a single recipient (NIP-59)
    fn seal_gift_wrap<'a>(
        &'a self,
        keys: &'a Keys,
        rumor: UnsignedEvent,
        recipient: &'a PublicKey,
    ) -> BoxedFuture<'a, Result<Event, EncryptionError>>;

    /// Unwrap a gift wrap addressed to `keys` (NIP-59)
    fn unwrap_gift_wrap<'a>(
        &'a self,
        keys: &'a Keys,
        gift_wrap: &'a Event,
    ) -> BoxedFuture<'a, Result<UnwrappedGift, EncryptionError>>;
}

#[doc(hidden)]
pub trait IntoEncryptionProvider {
    #[doc(hidden)]
    fn into_encryption_provider(self) -> Arc<dyn EncryptionProvider>;
}

impl IntoEncryptionProvider for Arc<dyn EncryptionProvider> {
    fn into_encryption_provider(self) -> Arc<dyn EncryptionProvider> {
        self
    }
}

impl<T> IntoEncryptionProvider for T
where
    T: EncryptionProvider + Sized + 'static,
{
    fn into_encryption_provider(self) -> Arc<dyn EncryptionProvider> {
        Arc::new(self)
    }
}

impl<T> IntoEncryptionProvider for Arc<T>
where
    T: EncryptionProvider + 'static,
{
    fn into_encryption_provider(self) -> Arc<dyn EncryptionProvider> {
        self
    }
}

/// Encryption provider backed by the `nostr` crate
#[derive(Debug, Clone, Copy, Default)]
pub struct NostrEncryption;

impl EncryptionProvider for NostrEncryption {
    fn encrypt_legacy(
        &self,
        keys: &Keys,
        recipient: &PublicKey,
        plaintext: &str,
    ) -> Result<String, EncryptionError> {
        nip04::encrypt(keys.secret_key(), recipient, plaintext).map_err(EncryptionError::backend)
    }

    fn decrypt_legacy(
        &self,
        keys: &Keys,
        counterpart: &PublicKey,
        ciphertext: &str,
    ) -> Result<String, EncryptionError> {
        nip04::decrypt(keys.secret_key(), counterpart, ciphertext)
            .map_err(EncryptionError::backend)
    }

    fn seal_gift_wrap<'a>(
        &'a self,
        keys: &'a Keys,
        rumor: UnsignedEvent,
        recipient: &'a PublicKey,
    ) -> BoxedFuture<'a, Result<Event, EncryptionError>> {
        Box::pin(async move {
            EventBuilder::gift_wrap(keys, recipient, rumor, Vec::<Tag>::new())
                .await
                .map_err(EncryptionError::backend)
        })
    }

    fn unwrap_gift_wrap<'a>(
        &'a self,
        keys: &'a Keys,
        gift_wrap: &'a Event,
    ) -> BoxedFuture<'a, Result<UnwrappedGift, EncryptionError>> {
        Box::pin(async move {
            UnwrappedGift::from_gift_wrap(keys, gift_wrap)
                .await
                .map_err(EncryptionError::backend)
        })
    }
}
