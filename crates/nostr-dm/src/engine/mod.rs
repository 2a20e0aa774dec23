// Copyright (c) 2022-2023 Yuki Kishimoto
// Copyright (c) 2023-2025 Rust Nostr Developers
// Distributed under the MIT software license

//! Conversation engine

use std::collections::{HashMap, HashSet};
use std::sync::atomic::AtomicBool;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use futures::future::AbortHandle;
use nostr::{EventId, Keys, PublicKey, RelayUrl, Timestamp};
use tokio::sync::broadcast;

mod ack;
mod builder;
mod ingest;
mod locks;
mod notification;
mod rescan;
mod send;

pub use self::builder::DmEngineBuilder;
pub use self::ingest::IngestStatus;
use self::locks::ConversationLocks;
pub use self::notification::DmNotification;
pub use self::send::SendOutput;
use crate::classifier::{ConversationBuckets, ConversationClassifier};
use crate::conversation::ConversationRecord;
use crate::crypto::EncryptionProvider;
use crate::dedup::RecentlySent;
use crate::delivery::{DeliveryKey, DeliveryLedger, RecipientResult, SendJob};
use crate::directory::DmRelayDirectory;
use crate::error::Error;
use crate::key::{ConversationKey, Participants};
use crate::message::{self, DirectMessage};
use crate::options::DmOptions;
use crate::store::{ConversationStore, SaveMessageStatus};
use crate::tracker::CorrelationTracker;
use crate::transport::{RelayAck, RelayTransport};
use crate::version::ProtocolVersion;

/// Local account
#[derive(Debug, Clone)]
pub struct DmAccount {
    public_key: PublicKey,
    keys: Option<Keys>,
}

impl From<Keys> for DmAccount {
    fn from(keys: Keys) -> Self {
        Self::new(keys)
    }
}

impl DmAccount {
    /// Account with private key
    #[inline]
    pub fn new(keys: Keys) -> Self {
        Self {
            public_key: keys.public_key(),
            keys: Some(keys),
        }
    }

    /// Account without private key
    ///
    /// Conversations can be listed and classified, but messages can't be sent or decrypted.
    #[inline]
    pub fn read_only(public_key: PublicKey) -> Self {
        Self {
            public_key,
            keys: None,
        }
    }

    /// Public key
    #[inline]
    pub fn public_key(&self) -> PublicKey {
        self.public_key
    }

    /// Keys
    pub fn keys(&self) -> Result<&Keys, Error> {
        self.keys.as_ref().ok_or(Error::MissingPrivateKey)
    }
}

#[derive(Debug)]
struct InnerDmEngine {
    account: DmAccount,
    transport: Arc<dyn RelayTransport>,
    store: Arc<dyn ConversationStore>,
    directory: Arc<dyn DmRelayDirectory>,
    encryption: Arc<dyn EncryptionProvider>,
    write_relays: HashSet<RelayUrl>,
    opts: DmOptions,
    locks: ConversationLocks,
    recently_sent: Mutex<RecentlySent>,
    ledger: Arc<Mutex<DeliveryLedger>>,
    tracker: Arc<CorrelationTracker<DeliveryKey, RelayAck>>,
    pending_publish: Mutex<HashMap<EventId, AbortHandle>>,
    rescanning: AtomicBool,
    notifications: broadcast::Sender<DmNotification>,
}

/// Encrypted direct message conversation engine
///
/// Cheap to clone: all the clones share the same state.
#[derive(Debug, Clone)]
pub struct DmEngine {
    inner: Arc<InnerDmEngine>,
}

/// Lock a std mutex, recovering it if poisoned
#[inline]
fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

impl DmEngine {
    /// Construct a new engine with default collaborators and options
    ///
    /// Use [`DmEngine::builder`] to customize it.
    #[inline]
    pub fn new<A, T>(account: A, transport: T) -> Self
    where
        A: Into<DmAccount>,
        T: crate::transport::IntoRelayTransport,
    {
        Self::builder(account, transport).build()
    }

    /// Construct a new engine builder
    #[inline]
    pub fn builder<A, T>(account: A, transport: T) -> DmEngineBuilder
    where
        A: Into<DmAccount>,
        T: crate::transport::IntoRelayTransport,
    {
        DmEngineBuilder::new(account, transport)
    }

    fn from_builder(builder: DmEngineBuilder) -> Self {
        let (notifications, ..) = broadcast::channel(builder.opts.notification_channel_size);

        Self {
            inner: Arc::new(InnerDmEngine {
                account: builder.account,
                transport: builder.transport,
                store: builder.store,
                directory: builder.directory,
                encryption: builder.encryption,
                write_relays: builder.write_relays,
                recently_sent: Mutex::new(RecentlySent::new(builder.opts.dedup_capacity)),
                ledger: Arc::new(Mutex::new(DeliveryLedger::new(
                    crate::constant::MAX_TRACKED_MESSAGES,
                ))),
                tracker: Arc::new(CorrelationTracker::new()),
                pending_publish: Mutex::new(HashMap::new()),
                rescanning: AtomicBool::new(false),
                locks: ConversationLocks::default(),
                notifications,
                opts: builder.opts,
            }),
        }
    }

    /// Local account public key
    #[inline]
    pub fn public_key(&self) -> PublicKey {
        self.inner.account.public_key()
    }

    /// Options
    #[inline]
    pub fn options(&self) -> &DmOptions {
        &self.inner.opts
    }

    /// Subscribe to notifications
    #[inline]
    pub fn notifications(&self) -> broadcast::Receiver<DmNotification> {
        self.inner.notifications.subscribe()
    }

    #[inline]
    fn notify(&self, notification: DmNotification) {
        let _ = self.inner.notifications.send(notification);
    }

    /// Participants including the local account
    fn with_account<I>(&self, participants: I) -> Participants
    where
        I: IntoIterator<Item = PublicKey>,
    {
        participants
            .into_iter()
            .chain([self.public_key()])
            .collect()
    }

    /// Get all the conversations, most recent first
    pub async fn conversations(&self) -> Result<Vec<ConversationRecord>, Error> {
        Ok(self.inner.store.fetch_by_account(&self.public_key()).await?)
    }

    /// Get a conversation
    pub async fn conversation(&self, key: &ConversationKey) -> Result<ConversationRecord, Error> {
        self.inner
            .store
            .fetch(&self.public_key(), key)
            .await?
            .ok_or_else(|| Error::ConversationNotFound(key.clone()))
    }

    /// Classify all the conversations
    pub async fn classify(
        &self,
        classifier: &ConversationClassifier,
    ) -> Result<ConversationBuckets, Error> {
        let conversations: Vec<ConversationRecord> = self.conversations().await?;
        Ok(classifier.classify(conversations))
    }

    /// Messages of a conversation, sorted by creation timestamp
    pub async fn messages(&self, key: &ConversationKey) -> Result<Vec<DirectMessage>, Error> {
        Ok(self.inner.store.messages(&self.public_key(), key).await?)
    }

    /// Messages of a conversation grouped by UTC day
    pub async fn messages_by_day(
        &self,
        key: &ConversationKey,
    ) -> Result<Vec<(u64, Vec<DirectMessage>)>, Error> {
        let messages: Vec<DirectMessage> = self.messages(key).await?;
        Ok(message::group_by_day(messages))
    }

    /// Delivery results of an outbound message
    ///
    /// Returns `None` if the message is unknown, was sent with the legacy protocol or is too old.
    pub fn delivery(&self, message_id: &EventId) -> Option<Vec<RecipientResult>> {
        lock(&self.inner.ledger).results(message_id)
    }

    /// Send jobs of a message still waiting for some relay
    pub fn active_jobs(&self, message_id: &EventId) -> Vec<SendJob> {
        lock(&self.inner.ledger).active_jobs(message_id)
    }

    #[inline]
    fn is_recently_sent(&self, id: &EventId) -> bool {
        lock(&self.inner.recently_sent).contains(id)
    }

    /// Save a message and update its conversation, under the conversation lock
    ///
    /// Duplicates leave the conversation untouched.
    async fn store_message(
        &self,
        participants: &Participants,
        message: &DirectMessage,
    ) -> Result<SaveMessageStatus, Error> {
        let account: PublicKey = self.public_key();
        let _guard = self.inner.locks.lock(&message.conversation).await;

        let status: SaveMessageStatus = self.inner.store.save_message(&account, message).await?;

        if !status.is_saved() {
            return Ok(status);
        }

        let mut record: ConversationRecord = self
            .inner
            .store
            .fetch_or_create(&account, participants)
            .await?;
        record.apply_message(message);

        let messages: Vec<DirectMessage> = self.messages(&message.conversation).await?;
        record.recompute_unread(&messages);

        self.inner.store.save_conversation(&record).await?;

        self.notify(DmNotification::NewMessage {
            message: Box::new(message.clone()),
        });
        self.notify(DmNotification::ConversationUpdated {
            conversation: record.key,
        });

        Ok(status)
    }

    /// Record a relay where a message has been seen or accepted
    async fn seen_on(
        &self,
        message_id: &EventId,
        relay_url: Option<&RelayUrl>,
    ) -> Result<(), Error> {
        if let Some(relay_url) = relay_url {
            let updated: bool = self
                .inner
                .store
                .add_message_relay(&self.public_key(), message_id, relay_url)
                .await?;

            if updated {
                tracing::trace!(id = %message_id, relay = %relay_url, "Message seen on relay.");
            }
        }

        Ok(())
    }

    /// Update a conversation under its lock and notify the change
    async fn update_conversation<F>(&self, key: &ConversationKey, f: F) -> Result<(), Error>
    where
        F: FnOnce(&mut ConversationRecord, &[DirectMessage]) -> bool,
    {
        let _guard = self.inner.locks.lock(key).await;

        let mut record: ConversationRecord = self.conversation(key).await?;
        let messages: Vec<DirectMessage> = self.messages(key).await?;

        if f(&mut record, &messages) {
            self.inner.store.save_conversation(&record).await?;
            self.notify(DmNotification::ConversationUpdated {
                conversation: key.clone(),
            });
        }

        Ok(())
    }

    /// Mark a conversation as read now
    pub async fn mark_as_read(&self, key: &ConversationKey) -> Result<(), Error> {
        let now: Timestamp = Timestamp::now();
        self.update_conversation(key, |record, messages| {
            record.mark_read(now, messages);
            true
        })
        .await
    }

    /// Mark many conversations as read (i.e., all the ones of a bucket)
    pub async fn mark_all_as_read<'a, I>(&self, keys: I) -> Result<(), Error>
    where
        I: IntoIterator<Item = &'a ConversationKey>,
    {
        for key in keys.into_iter() {
            self.mark_as_read(key).await?;
        }

        Ok(())
    }

    /// Accept a message request
    pub async fn accept(&self, key: &ConversationKey) -> Result<(), Error> {
        self.update_conversation(key, |record, _| {
            if record.accepted {
                return false;
            }

            record.accepted = true;
            true
        })
        .await
    }

    /// Hide or unhide a conversation
    pub async fn hide(&self, key: &ConversationKey, hidden: bool) -> Result<(), Error> {
        self.update_conversation(key, |record, _| {
            if record.hidden == hidden {
                return false;
            }

            record.hidden = hidden;
            true
        })
        .await
    }

    /// Unhide all the conversations
    ///
    /// Returns the number of conversations that were hidden.
    pub async fn unhide_all(&self) -> Result<usize, Error> {
        let hidden: Vec<ConversationKey> = self
            .conversations()
            .await?
            .into_iter()
            .filter(|c| c.hidden)
            .map(|c| c.key)
            .collect();

        for key in hidden.iter() {
            self.hide(key, false).await?;
        }

        Ok(hidden.len())
    }

    /// Pin or unpin a conversation
    pub async fn pin(&self, key: &ConversationKey, pinned: bool) -> Result<(), Error> {
        self.update_conversation(key, |record, _| {
            if record.pinned == pinned {
                return false;
            }

            record.pinned = pinned;
            true
        })
        .await
    }

    /// Store the preferred protocol version of a conversation
    ///
    /// A [`ProtocolVersion::Modern`] preference is always honored when sending,
    /// while a [`ProtocolVersion::Legacy`] one never downgrades a conversation that resolves to modern.
    pub async fn set_protocol_version(
        &self,
        key: &ConversationKey,
        version: ProtocolVersion,
    ) -> Result<(), Error> {
        self.update_conversation(key, |record, _| {
            if record.version == Some(version) {
                return false;
            }

            record.version = Some(version);
            true
        })
        .await
    }
}
