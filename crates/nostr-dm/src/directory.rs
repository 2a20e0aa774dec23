// Copyright (c) 2022-2023 Yuki Kishimoto
// Copyright (c) 2023-2025 Rust Nostr Developers
// Distributed under the MIT software license

//! DM relay directory
//!
//! <https://github.com/nostr-protocol/nips/blob/master/17.md>

use std::any::Any;
use std::collections::HashSet;
use std::fmt::{self, Debug};
use std::sync::Arc;

use nostr::util::BoxedFuture;
use nostr::{PublicKey, RelayUrl};

/// Directory error
#[derive(Debug)]
pub enum DirectoryError {
    /// An error happened in the underlying backend.
    Backend(Box<dyn std::error::Error + Send + Sync>),
}

impl std::error::Error for DirectoryError {}

impl fmt::Display for DirectoryError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Backend(e) => fmt::Display::fmt(e, f),
        }
    }
}

impl DirectoryError {
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

/// Lookup of the relays where a user wants to receive private messages (kind 10050)
pub trait DmRelayDirectory: Any + Debug + Send + Sync {
    /// Get the DM relays of a [`PublicKey`]
    ///
    /// May await a network fetch if the list is not known yet.
    /// An empty set means that the user doesn't publish any DM relay.
    fn dm_relays<'a>(
        &'a self,
        public_key: &'a PublicKey,
    ) -> BoxedFuture<'a, Result<HashSet<RelayUrl>, DirectoryError>>;
}

#[doc(hidden)]
pub trait IntoDmRelayDirectory {
    #[doc(hidden)]
    fn into_dm_relay_directory(self) -> Arc<dyn DmRelayDirectory>;
}

impl IntoDmRelayDirectory for Arc<dyn DmRelayDirectory> {
    fn into_dm_relay_directory(self) -> Arc<dyn DmRelayDirectory> {
        self
    }
}

impl<T> IntoDmRelayDirectory for T
where
    T: DmRelayDirectory + Sized + 'static,
{
    fn into_dm_relay_directory(self) -> Arc<dyn DmRelayDirectory> {
        Arc::new(self)
    }
}

impl<T> IntoDmRelayDirectory for Arc<T>
where
    T: DmRelayDirectory + 'static,
{
    fn into_dm_relay_directory(self) -> Arc<dyn DmRelayDirectory> {
        self
    }
}
