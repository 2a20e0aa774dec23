// Copyright (c) 2022-2023 Yuki Kishimoto
// Copyright (c) 2023-2025 Rust Nostr Developers
// Distributed under the MIT software license

//! Engine builder

use std::collections::HashSet;
use std::sync::Arc;

use nostr::RelayUrl;

use super::{DmAccount, DmEngine};
use crate::crypto::{EncryptionProvider, IntoEncryptionProvider, NostrEncryption};
use crate::directory::{DmRelayDirectory, IntoDmRelayDirectory};
use crate::memory::{MemoryConversationStore, MemoryRelayDirectory};
use crate::options::DmOptions;
use crate::store::{ConversationStore, IntoConversationStore};
use crate::transport::{IntoRelayTransport, RelayTransport};

/// Engine builder
#[derive(Debug, Clone)]
pub struct DmEngineBuilder {
    /// Local account
    pub account: DmAccount,
    /// Relay transport
    pub transport: Arc<dyn RelayTransport>,
    /// Conversation store
    pub store: Arc<dyn ConversationStore>,
    /// DM relay directory
    pub directory: Arc<dyn DmRelayDirectory>,
    /// Encryption provider
    pub encryption: Arc<dyn EncryptionProvider>,
    /// Write relays, used for legacy messages and as fallback for the self-addressed copies
    pub write_relays: HashSet<RelayUrl>,
    /// Options
    pub opts: DmOptions,
}

impl DmEngineBuilder {
    /// New builder
    ///
    /// By default an in-memory store and directory are used.
    pub fn new<A, T>(account: A, transport: T) -> Self
    where
        A: Into<DmAccount>,
        T: IntoRelayTransport,
    {
        Self {
            account: account.into(),
            transport: transport.into_relay_transport(),
            store: Arc::new(MemoryConversationStore::default()),
            directory: Arc::new(MemoryRelayDirectory::default()),
            encryption: Arc::new(NostrEncryption),
            write_relays: HashSet::new(),
            opts: DmOptions::default(),
        }
    }

    /// Set conversation store
    #[inline]
    pub fn store<S>(mut self, store: S) -> Self
    where
        S: IntoConversationStore,
    {
        self.store = store.into_conversation_store();
        self
    }

    /// Set DM relay directory
    #[inline]
    pub fn directory<D>(mut self, directory: D) -> Self
    where
        D: IntoDmRelayDirectory,
    {
        self.directory = directory.into_dm_relay_directory();
        self
    }

    /// Set encryption provider
    ///
    /// By default [`NostrEncryption`] is used.
    #[inline]
    pub fn encryption<E>(mut self, encryption: E) -> Self
    where
        E: IntoEncryptionProvider,
    {
        self.encryption = encryption.into_encryption_provider();
        self
    }

    /// Set write relays
    #[inline]
    pub fn write_relays<I>(mut self, relays: I) -> Self
    where
        I: IntoIterator<Item = RelayUrl>,
    {
        self.write_relays = relays.into_iter().collect();
        self
    }

    /// Set options
    #[inline]
    pub fn opts(mut self, opts: DmOptions) -> Self {
        self.opts = opts;
        self
    }

    /// Build [`DmEngine`]
    #[inline]
    pub fn build(self) -> DmEngine {
        DmEngine::from_builder(self)
    }
}
