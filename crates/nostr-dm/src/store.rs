// Copyright (c) 2022-2023 Yuki Kishimoto
// Copyright (c) 2023-2025 Rust Nostr Developers
// Distributed under the MIT software license

//! Conversation store

use std::any::Any;
use std::fmt::{self, Debug};
use std::sync::Arc;

use nostr::util::BoxedFuture;
use nostr::{EventId, PublicKey, RelayUrl};

use crate::conversation::ConversationRecord;
use crate::key::{ConversationKey, Participants};
use crate::message::DirectMessage;

/// Store error
#[derive(Debug)]
pub enum StoreError {
    /// An error happened in the underlying backend.
    Backend(Box<dyn std::error::Error + Send + Sync>),
}

impl std::error::Error for StoreError {}

impl fmt::Display for StoreError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Backend(e) => fmt::Display::fmt(e, f),
        }
    }
}

impl StoreError {
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

/// Save message status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SaveMessageStatus {
    /// The message has been stored
    Saved,
    /// A message with the same ID is already stored
    Duplicate,
}

impl SaveMessageStatus {
    /// Check if the message has been stored
    #[inline]
    pub fn is_saved(&self) -> bool {
        matches!(self, Self::Saved)
    }
}

/// Persistent store of conversations and their decrypted messages
///
/// Every record is scoped to a local account.
pub trait ConversationStore: Any + Debug + Send + Sync {
    /// Get the conversation of `participants` or create a new one (not accepted)
    fn fetch_or_create<'a>(
        &'a self,
        account: &'a PublicKey,
        participants: &'a Participants,
    ) -> BoxedFuture<'a, Result<ConversationRecord, StoreError>>;

    /// Get a conversation by key
    fn fetch<'a>(
        &'a self,
        account: &'a PublicKey,
        key: &'a ConversationKey,
    ) -> BoxedFuture<'a, Result<Option<ConversationRecord>, StoreError>>;

    /// Get all the conversations of an account
    ///
    /// Most recent conversations first.
    fn fetch_by_account<'a>(
        &'a self,
        account: &'a PublicKey,
    ) -> BoxedFuture<'a, Result<Vec<ConversationRecord>, StoreError>>;

    /// Write the conversation fields
    fn save_conversation<'a>(
        &'a self,
        record: &'a ConversationRecord,
    ) -> BoxedFuture<'a, Result<(), StoreError>>;

    /// Save a message
    fn save_message<'a>(
        &'a self,
        account: &'a PublicKey,
        message: &'a DirectMessage,
    ) -> BoxedFuture<'a, Result<SaveMessageStatus, StoreError>>;

    /// Get a message by ID
    fn message<'a>(
        &'a self,
        account: &'a PublicKey,
        id: &'a EventId,
    ) -> BoxedFuture<'a, Result<Option<DirectMessage>, StoreError>>;

    /// Get the messages of a conversation, sorted by creation timestamp (ascending)
    fn messages<'a>(
        &'a self,
        account: &'a PublicKey,
        key: &'a ConversationKey,
    ) -> BoxedFuture<'a, Result<Vec<DirectMessage>, StoreError>>;

    /// Remove a message
    ///
    /// Returns `false` if the message doesn't exist.
    fn remove_message<'a>(
        &'a self,
        account: &'a PublicKey,
        id: &'a EventId,
    ) -> BoxedFuture<'a, Result<bool, StoreError>>;

    /// Add a relay to the relays where the message has been seen
    ///
    /// Returns `false` if the message doesn't exist.
    fn add_message_relay<'a>(
        &'a self,
        account: &'a PublicKey,
        id: &'a EventId,
        relay_url: &'a RelayUrl,
    ) -> BoxedFuture<'a, Result<bool, StoreError>>;
}

#[doc(hidden)]
pub trait IntoConversationStore {
    #[doc(hidden)]
    fn into_conversation_store(self) -> Arc<dyn ConversationStore>;
}

impl IntoConversationStore for Arc<dyn ConversationStore> {
    fn into_conversation_store(self) -> Arc<dyn ConversationStore> {
        self
    }
}

impl<T> IntoConversationStore for T
where
    T: ConversationStore + Sized + 'static,
{
    fn into_conversation_store(self) -> Arc<dyn ConversationStore> {
        Arc::new(self)
    }
}

impl<T> IntoConversationStore for Arc<T>
where
    T: ConversationStore + 'static,
{
    fn into_conversation_store(self) -> Arc<dyn ConversationStore> {
        self
    }
}
