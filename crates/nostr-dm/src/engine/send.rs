// Copyright (c) 2022-2023 Yuki Kishimoto
// Copyright (c) 2023-2025 Rust Nostr Developers
// Distributed under the MIT software license

use std::collections::HashSet;

use async_utility::{task, time};
use futures::future::{self, AbortHandle, Abortable, BoxFuture, FutureExt, Shared};
use nostr::{Event, EventBuilder, EventId, Keys, Kind, PublicKey, RelayUrl, Tag, UnsignedEvent};

use super::{lock, DmEngine, DmNotification};
use crate::conversation::ConversationRecord;
use crate::delivery::{RecipientResult, SendJob};
use crate::error::Error;
use crate::key::Participants;
use crate::message::{DirectMessage, MessageKind};
use crate::version::{self, ProtocolVersion, VersionDecision};

/// Send output
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SendOutput {
    /// Locally stored message
    pub message: DirectMessage,
    /// Protocol version used
    pub version: ProtocolVersion,
    /// Delivery results at send time
    ///
    /// Empty for legacy messages. Partial when an undo window is configured.
    pub results: Vec<RecipientResult>,
}

/// Resolves when the undo window expires
type UndoGate = Shared<BoxFuture<'static, ()>>;

impl DmEngine {
    /// Get the DM relays of a public key, bounded by the lookup timeout
    ///
    /// Failures and timeouts yield an empty set.
    pub(super) async fn lookup_dm_relays(&self, public_key: &PublicKey) -> HashSet<RelayUrl> {
        match time::timeout(
            Some(self.inner.opts.relay_lookup_timeout),
            self.inner.directory.dm_relays(public_key),
        )
        .await
        {
            Some(Ok(relays)) => relays,
            Some(Err(e)) => {
                tracing::warn!(public_key = %public_key, error = %e, "Impossible to get DM relays.");
                HashSet::new()
            }
            None => {
                tracing::warn!(public_key = %public_key, "Timeout while getting DM relays.");
                HashSet::new()
            }
        }
    }

    async fn resolve_with_history(
        &self,
        participants: &Participants,
        messages: &[DirectMessage],
    ) -> ProtocolVersion {
        match version::decide(participants.len(), messages) {
            VersionDecision::Decided(version) => version,
            VersionDecision::NeedsRelayLookup => {
                let account: PublicKey = self.public_key();
                let recipient: PublicKey = participants
                    .receivers(&account)
                    .next()
                    .copied()
                    .unwrap_or(account);
                let relays: HashSet<RelayUrl> = self.lookup_dm_relays(&recipient).await;
                version::with_relay_lookup(!relays.is_empty())
            }
        }
    }

    /// Resolve the protocol version of the conversation with `participants`
    ///
    /// The local account is always added to the participants.
    /// A failed or timed out DM relay lookup falls back to [`ProtocolVersion::Legacy`].
    pub async fn resolve_protocol_version<I>(&self, participants: I) -> Result<ProtocolVersion, Error>
    where
        I: IntoIterator<Item = PublicKey>,
    {
        let participants: Participants = self.with_account(participants);
        let messages: Vec<DirectMessage> = self.messages(&participants.key()).await?;
        Ok(self.resolve_with_history(&participants, &messages).await)
    }

    /// Send a message to `receivers`
    ///
    /// The message is stored and notified before being handed to the transport.
    /// Pass only the own public key to write a note to self.
    pub async fn send_message<I, S>(&self, receivers: I, content: S) -> Result<SendOutput, Error>
    where
        I: IntoIterator<Item = PublicKey>,
        S: Into<String>,
    {
        let receivers: Vec<PublicKey> = receivers.into_iter().collect();

        if receivers.is_empty() {
            return Err(Error::EmptyParticipants);
        }

        let keys: &Keys = self.inner.account.keys()?;
        let content: String = content.into();

        let participants: Participants = self.with_account(receivers);
        let record: ConversationRecord = self
            .inner
            .store
            .fetch_or_create(&self.public_key(), &participants)
            .await?;
        let messages: Vec<DirectMessage> = self.messages(&record.key).await?;

        let version: ProtocolVersion = match record.version {
            // A stored modern preference always wins
            Some(ProtocolVersion::Modern) => ProtocolVersion::Modern,
            _ => self.resolve_with_history(&participants, &messages).await,
        };

        tracing::debug!(conversation = %record.key, version = %version, "Sending message.");

        match version {
            ProtocolVersion::Legacy => self.send_legacy(keys, &participants, content).await,
            ProtocolVersion::Modern => self.send_modern(keys, &participants, content).await,
        }
    }

    async fn send_legacy(
        &self,
        keys: &Keys,
        participants: &Participants,
        content: String,
    ) -> Result<SendOutput, Error> {
        let account: PublicKey = self.public_key();
        let recipient: PublicKey = participants.counterpart(&account).unwrap_or(account);

        let ciphertext: String = self
            .inner
            .encryption
            .encrypt_legacy(keys, &recipient, &content)?;
        let event: Event = EventBuilder::new(Kind::EncryptedDirectMessage, ciphertext)
            .tag(Tag::public_key(recipient))
            .sign_with_keys(keys)?;

        lock(&self.inner.recently_sent).record(event.id);

        let message: DirectMessage = DirectMessage {
            id: event.id,
            conversation: participants.key(),
            sender: account,
            created_at: event.created_at,
            content,
            kind: MessageKind::Legacy,
            relays: HashSet::new(),
        };

        self.store_message(participants, &message).await?;
        self.schedule_legacy(message.id, event).await;

        Ok(SendOutput {
            message,
            version: ProtocolVersion::Legacy,
            results: Vec::new(),
        })
    }

    async fn send_modern(
        &self,
        keys: &Keys,
        participants: &Participants,
        content: String,
    ) -> Result<SendOutput, Error> {
        let account: PublicKey = self.public_key();

        let mut rumor: UnsignedEvent = EventBuilder::new(Kind::PrivateDirectMessage, &content)
            .tags(participants.receivers(&account).map(|pk| Tag::public_key(*pk)))
            .build(account);
        rumor.ensure_id();

        let message_id: EventId = rumor.id();

        // One wrap per participant, self included, sealed before touching anything
        let mut wraps: Vec<(PublicKey, Event)> = Vec::with_capacity(participants.len());
        for public_key in participants.iter() {
            let wrap: Event = self
                .inner
                .encryption
                .seal_gift_wrap(keys, rumor.clone(), public_key)
                .await?;
            wraps.push((*public_key, wrap));
        }

        lock(&self.inner.recently_sent).record(message_id);

        let message: DirectMessage = DirectMessage {
            id: message_id,
            conversation: participants.key(),
            sender: account,
            created_at: rumor.created_at,
            content,
            kind: MessageKind::Modern,
            relays: HashSet::new(),
        };

        self.store_message(participants, &message).await?;

        lock(&self.inner.ledger).track(message_id, message.conversation.clone());

        match self.inner.opts.undo_window {
            Some(window) => {
                let (handle, registration) = AbortHandle::new_pair();
                lock(&self.inner.pending_publish).insert(message_id, handle);

                let engine: DmEngine = self.clone();
                let gate: UndoGate = async move {
                    time::sleep(window).await;

                    // From now on the send can't be undone
                    lock(&engine.inner.pending_publish).remove(&message_id);
                }
                .boxed()
                .shared();

                let engine: DmEngine = self.clone();
                let fut = async move {
                    engine.fan_out(message_id, wraps, Some(gate)).await;
                };

                task::spawn(Abortable::new(fut, registration));
            }
            None => self.fan_out(message_id, wraps, None).await,
        }

        let results: Vec<RecipientResult> = lock(&self.inner.ledger)
            .results(&message_id)
            .unwrap_or_default();

        Ok(SendOutput {
            message,
            version: ProtocolVersion::Modern,
            results,
        })
    }

    /// Deliver every wrap concurrently
    async fn fan_out(
        &self,
        message_id: EventId,
        wraps: Vec<(PublicKey, Event)>,
        gate: Option<UndoGate>,
    ) {
        let deliveries = future::join_all(wraps.into_iter().map(|(recipient, wrap)| {
            self.deliver_to(message_id, recipient, wrap, gate.clone())
        }));

        match gate {
            Some(gate) => {
                future::join(gate, deliveries).await;
            }
            None => {
                deliveries.await;
            }
        }
    }

    /// Look up the DM relays of a recipient and hand its wrap to the transport
    ///
    /// The ledger is updated as soon as the lookup resolves.
    /// The wrap waits for the undo gate, if any.
    async fn deliver_to(
        &self,
        message_id: EventId,
        recipient: PublicKey,
        wrap: Event,
        gate: Option<UndoGate>,
    ) {
        let mut relays: HashSet<RelayUrl> = self.lookup_dm_relays(&recipient).await;

        // Backup copy: fallback to write relays
        let is_self: bool = recipient == self.public_key();
        if is_self && relays.is_empty() {
            relays = self.inner.write_relays.clone();
        }

        if relays.is_empty() {
            tracing::info!(id = %message_id, recipient = %recipient, "No DM relays found.");
            lock(&self.inner.ledger).record_no_relays(&message_id, recipient);
            return;
        }

        let job: SendJob = SendJob {
            message_id,
            recipient,
            relays,
            wrap,
        };

        if !lock(&self.inner.ledger).add_job(job.clone(), is_self) {
            tracing::debug!(id = %message_id, recipient = %recipient, "Message no longer tracked, wrap not sent.");
            return;
        }

        if let Some(gate) = gate {
            gate.await;
        }

        self.dispatch_job(&job).await;
    }

    /// Publish a legacy message now or, if an undo window is configured, in background once it expires
    async fn schedule_legacy(&self, message_id: EventId, event: Event) {
        match self.inner.opts.undo_window {
            Some(window) => {
                let (handle, registration) = AbortHandle::new_pair();
                lock(&self.inner.pending_publish).insert(message_id, handle);

                let engine: DmEngine = self.clone();
                let fut = async move {
                    time::sleep(window).await;

                    // From now on the send can't be undone
                    lock(&engine.inner.pending_publish).remove(&message_id);

                    engine.publish_legacy(event).await;
                };

                task::spawn(Abortable::new(fut, registration));
            }
            None => self.publish_legacy(event).await,
        }
    }

    async fn publish_legacy(&self, event: Event) {
        if self.inner.write_relays.is_empty() {
            tracing::warn!(id = %event.id, "No write relays, legacy message not sent.");
            return;
        }

        if let Err(e) = self
            .inner
            .transport
            .send(&event, &self.inner.write_relays)
            .await
        {
            tracing::error!(id = %event.id, error = %e, "Impossible to send message.");
        }
    }

    /// Hand the wrap of a job to the transport
    ///
    /// Relays without a persistent connection get a one-shot connection.
    async fn dispatch_job(&self, job: &SendJob) {
        self.track_job(job);

        let mut connected: HashSet<RelayUrl> = HashSet::with_capacity(job.relays.len());

        for relay_url in job.relays.iter() {
            if self.inner.transport.is_connected(relay_url).await {
                connected.insert(relay_url.clone());
            } else if let Err(e) = self
                .inner
                .transport
                .send_ephemeral(&job.wrap, relay_url)
                .await
            {
                tracing::warn!(id = %job.wire_id(), relay = %relay_url, error = %e, "Impossible to send gift wrap.");
            }
        }

        if !connected.is_empty() {
            if let Err(e) = self.inner.transport.send(&job.wrap, &connected).await {
                tracing::warn!(id = %job.wire_id(), error = %e, "Impossible to send gift wrap.");
            }
        }
    }

    /// Undo a send
    ///
    /// Aborts the pending publish (if any), stops the delivery tracking and removes the message.
    /// Only messages sent by the local account can be removed.
    pub async fn cancel_send(&self, message_id: &EventId) -> Result<(), Error> {
        let account: PublicKey = self.public_key();

        let message: DirectMessage = self
            .inner
            .store
            .message(&account, message_id)
            .await?
            .filter(|m| m.is_from(&account))
            .ok_or(Error::MessageNotFound(*message_id))?;

        let _guard = self.inner.locks.lock(&message.conversation).await;

        if let Some(handle) = lock(&self.inner.pending_publish).remove(message_id) {
            handle.abort();
        }

        let wraps: Option<HashSet<EventId>> = lock(&self.inner.ledger).cancel(message_id);
        if let Some(wraps) = wraps {
            self.inner
                .tracker
                .cancel_where(|key| wraps.contains(&key.event_id));
        }

        if !self.inner.store.remove_message(&account, message_id).await? {
            return Err(Error::MessageNotFound(*message_id));
        }

        // Refresh the conversation state
        if let Some(mut record) = self
            .inner
            .store
            .fetch(&account, &message.conversation)
            .await?
        {
            let messages: Vec<DirectMessage> = self.messages(&message.conversation).await?;
            record.last_message_at = messages.iter().map(|m| m.created_at).max();
            record.recompute_unread(&messages);
            self.inner.store.save_conversation(&record).await?;
        }

        tracing::debug!(id = %message_id, "Send cancelled.");

        self.notify(DmNotification::MessageRemoved {
            message_id: *message_id,
            conversation: message.conversation,
        });

        Ok(())
    }
}
