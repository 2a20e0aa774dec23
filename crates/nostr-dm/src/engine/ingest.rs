// Copyright (c) 2022-2023 Yuki Kishimoto
// Copyright (c) 2023-2025 Rust Nostr Developers
// Distributed under the MIT software license

use std::collections::HashSet;

use nostr::nips::nip59::UnwrappedGift;
use nostr::{Event, EventId, Keys, Kind, PublicKey, RelayUrl, UnsignedEvent};

use super::DmEngine;
use crate::error::Error;
use crate::key::Participants;
use crate::message::{DirectMessage, MessageKind};
use crate::store::SaveMessageStatus;

/// Ingest status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum IngestStatus {
    /// New message stored
    Ingested,
    /// Message already known (sent by this engine or already stored)
    Duplicate,
    /// Not a direct message for this account, or undecryptable
    Dropped,
}

impl From<SaveMessageStatus> for IngestStatus {
    fn from(status: SaveMessageStatus) -> Self {
        match status {
            SaveMessageStatus::Saved => Self::Ingested,
            SaveMessageStatus::Duplicate => Self::Duplicate,
        }
    }
}

impl DmEngine {
    /// Handle an event received from a relay
    ///
    /// Accepts legacy direct messages (kind 4) and gift wraps (kind 1059).
    /// Any other kind is dropped.
    pub async fn handle_event(
        &self,
        event: &Event,
        relay_url: Option<&RelayUrl>,
    ) -> Result<IngestStatus, Error> {
        let keys: &Keys = self.inner.account.keys()?;

        if event.verify().is_err() {
            tracing::debug!(id = %event.id, "Event with invalid signature.");
            return Ok(IngestStatus::Dropped);
        }

        match event.kind {
            Kind::EncryptedDirectMessage => self.ingest_legacy(keys, event, relay_url).await,
            Kind::GiftWrap => self.ingest_modern(keys, event, relay_url).await,
            kind => {
                tracing::trace!(id = %event.id, kind = %kind, "Not a direct message.");
                Ok(IngestStatus::Dropped)
            }
        }
    }

    async fn finish(
        &self,
        participants: &Participants,
        message: DirectMessage,
        relay_url: Option<&RelayUrl>,
    ) -> Result<IngestStatus, Error> {
        let status: SaveMessageStatus = self.store_message(participants, &message).await?;

        if !status.is_saved() {
            self.seen_on(&message.id, relay_url).await?;
        }

        Ok(status.into())
    }

    /// Echo of a message sent by this engine
    async fn echo(
        &self,
        message_id: &EventId,
        relay_url: Option<&RelayUrl>,
    ) -> Result<IngestStatus, Error> {
        tracing::trace!(id = %message_id, "Echo of a sent message.");
        self.seen_on(message_id, relay_url).await?;
        Ok(IngestStatus::Duplicate)
    }

    async fn ingest_legacy(
        &self,
        keys: &Keys,
        event: &Event,
        relay_url: Option<&RelayUrl>,
    ) -> Result<IngestStatus, Error> {
        if self.is_recently_sent(&event.id) {
            return self.echo(&event.id, relay_url).await;
        }

        let account: PublicKey = self.public_key();

        let counterpart: PublicKey = if event.pubkey == account {
            match event.tags.public_keys().next() {
                Some(public_key) => *public_key,
                None => {
                    tracing::debug!(id = %event.id, "Legacy message without receiver.");
                    return Ok(IngestStatus::Dropped);
                }
            }
        } else if event.tags.public_keys().any(|pk| pk == &account) {
            event.pubkey
        } else {
            return Ok(IngestStatus::Dropped);
        };

        let content: String =
            match self
                .inner
                .encryption
                .decrypt_legacy(keys, &counterpart, &event.content)
            {
                Ok(content) => content,
                Err(e) => {
                    tracing::debug!(id = %event.id, error = %e, "Impossible to decrypt legacy message.");
                    return Ok(IngestStatus::Dropped);
                }
            };

        let participants: Participants = self.with_account([counterpart]);
        let message: DirectMessage = DirectMessage {
            id: event.id,
            conversation: participants.key(),
            sender: event.pubkey,
            created_at: event.created_at,
            content,
            kind: MessageKind::Legacy,
            relays: relay_url.cloned().into_iter().collect(),
        };

        self.finish(&participants, message, relay_url).await
    }

    async fn ingest_modern(
        &self,
        keys: &Keys,
        event: &Event,
        relay_url: Option<&RelayUrl>,
    ) -> Result<IngestStatus, Error> {
        let unwrapped: UnwrappedGift =
            match self.inner.encryption.unwrap_gift_wrap(keys, event).await {
                Ok(unwrapped) => unwrapped,
                Err(e) => {
                    tracing::debug!(id = %event.id, error = %e, "Impossible to unwrap gift wrap.");
                    return Ok(IngestStatus::Dropped);
                }
            };
        let sender: PublicKey = unwrapped.sender;
        let mut rumor: UnsignedEvent = unwrapped.rumor;

        // The seal author must be the rumor author
        if sender != rumor.pubkey {
            tracing::warn!(id = %event.id, sender = %sender, author = %rumor.pubkey, "Gift wrap with mismatching author.");
            return Ok(IngestStatus::Dropped);
        }

        if rumor.kind != Kind::PrivateDirectMessage {
            tracing::trace!(id = %event.id, kind = %rumor.kind, "Gift wrap without a direct message.");
            return Ok(IngestStatus::Dropped);
        }

        let account: PublicKey = self.public_key();
        let participants: Participants = Participants::from_rumor(&rumor);

        if !participants.contains(&account) {
            return Ok(IngestStatus::Dropped);
        }

        // A rumor is unsigned: its id must match its content
        if let Err(e) = rumor.verify_id() {
            tracing::warn!(id = %event.id, sender = %sender, error = %e, "Rumor with invalid id.");
            return Ok(IngestStatus::Dropped);
        }

        rumor.ensure_id();
        let message_id: EventId = rumor.id();

        if self.is_recently_sent(&message_id) {
            return self.echo(&message_id, relay_url).await;
        }

        let message: DirectMessage = modern_message(&participants, message_id, rumor, relay_url);
        self.finish(&participants, message, relay_url).await
    }
}

fn modern_message(
    participants: &Participants,
    id: EventId,
    rumor: UnsignedEvent,
    relay_url: Option<&RelayUrl>,
) -> DirectMessage {
    let relays: HashSet<RelayUrl> = relay_url.cloned().into_iter().collect();

    DirectMessage {
        id,
        conversation: participants.key(),
        sender: rumor.pubkey,
        created_at: rumor.created_at,
        content: rumor.content,
        kind: MessageKind::Modern,
        relays,
    }
}

#[cfg(test)]
mod tests {
    use nostr::{EventBuilder, Tag};

    use super::*;
    use crate::engine::tests::harness;
    use crate::engine::DmAccount;
    use crate::key::ConversationKey;
    use crate::testing::{self, MockTransport};
    use crate::version::ProtocolVersion;

    async fn gift_wrap(sender: &Keys, receiver: &PublicKey, rumor: UnsignedEvent) -> Event {
        EventBuilder::gift_wrap(sender, receiver, rumor, Vec::<Tag>::new())
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn test_inbound_modern_creates_request() {
        let h = harness();
        let bob = Keys::generate();
        let relay = testing::url("wss://inbox.example.com");

        let rumor = EventBuilder::new(Kind::PrivateDirectMessage, "hey")
            .tag(Tag::public_key(h.keys.public_key()))
            .build(bob.public_key());
        let wrap = gift_wrap(&bob, &h.keys.public_key(), rumor).await;

        let status = h.engine.handle_event(&wrap, Some(&relay)).await.unwrap();
        assert_eq!(status, IngestStatus::Ingested);

        // Same wrap from another relay
        let other = testing::url("wss://other.example.com");
        let status = h.engine.handle_event(&wrap, Some(&other)).await.unwrap();
        assert_eq!(status, IngestStatus::Duplicate);

        let key = ConversationKey::from_public_keys([bob.public_key(), h.keys.public_key()]);
        let record = h.engine.conversation(&key).await.unwrap();
        assert!(!record.accepted);
        assert_eq!(record.initiator, Some(bob.public_key()));
        assert_eq!(record.unread, 1);

        let messages = h.engine.messages(&key).await.unwrap();
        assert_eq!(messages.len(), 1);
        assert_eq!(messages[0].content, "hey");
        assert_eq!(messages[0].kind, MessageKind::Modern);
        assert!(messages[0].relays.contains(&relay));
        assert!(messages[0].relays.contains(&other));

        // History is modern now
        let version = h
            .engine
            .resolve_protocol_version([bob.public_key()])
            .await
            .unwrap();
        assert_eq!(version, ProtocolVersion::Modern);
    }

    #[tokio::test]
    async fn test_rumor_with_forged_id_is_dropped() {
        let h = harness();
        let bob = Keys::generate();
        let mallory = Keys::generate();

        let rumor = EventBuilder::new(Kind::PrivateDirectMessage, "original")
            .tag(Tag::public_key(h.keys.public_key()))
            .build(bob.public_key());
        let wrap = gift_wrap(&bob, &h.keys.public_key(), rumor).await;
        assert_eq!(
            h.engine.handle_event(&wrap, None).await.unwrap(),
            IngestStatus::Ingested
        );

        let bob_key = ConversationKey::from_public_keys([bob.public_key(), h.keys.public_key()]);
        let existing: EventId = h.engine.messages(&bob_key).await.unwrap()[0].id;

        // Reuse the id of the stored message for a different rumor
        let mut forged = EventBuilder::new(Kind::PrivateDirectMessage, "forged")
            .tag(Tag::public_key(h.keys.public_key()))
            .build(mallory.public_key());
        forged.id = Some(existing);
        let wrap = gift_wrap(&mallory, &h.keys.public_key(), forged).await;

        let relay = testing::url("wss://mallory.example.com");
        let status = h.engine.handle_event(&wrap, Some(&relay)).await.unwrap();
        assert_eq!(status, IngestStatus::Dropped);

        // Nothing created for mallory, nothing written on bob's message
        let mallory_key =
            ConversationKey::from_public_keys([mallory.public_key(), h.keys.public_key()]);
        assert!(matches!(
            h.engine.conversation(&mallory_key).await,
            Err(Error::ConversationNotFound(..))
        ));

        let messages = h.engine.messages(&bob_key).await.unwrap();
        assert_eq!(messages.len(), 1);
        assert_eq!(messages[0].content, "original");
        assert!(!messages[0].relays.contains(&relay));
    }

    #[tokio::test]
    async fn test_non_dm_rumor_is_dropped() {
        let h = harness();
        let bob = Keys::generate();

        let rumor = EventBuilder::new(Kind::TextNote, "not a dm")
            .tag(Tag::public_key(h.keys.public_key()))
            .build(bob.public_key());
        let wrap = gift_wrap(&bob, &h.keys.public_key(), rumor).await;

        let status = h.engine.handle_event(&wrap, None).await.unwrap();
        assert_eq!(status, IngestStatus::Dropped);
        assert!(h.engine.conversations().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_gift_wrap_for_someone_else_is_dropped() {
        let h = harness();
        let bob = Keys::generate();
        let carol = Keys::generate();

        let rumor = EventBuilder::new(Kind::PrivateDirectMessage, "for carol")
            .tag(Tag::public_key(carol.public_key()))
            .build(bob.public_key());
        let wrap = gift_wrap(&bob, &carol.public_key(), rumor).await;

        let status = h.engine.handle_event(&wrap, None).await.unwrap();
        assert_eq!(status, IngestStatus::Dropped);
    }

    #[tokio::test]
    async fn test_legacy_not_addressed_to_account_is_dropped() {
        let h = harness();
        let bob = Keys::generate();
        let carol = Keys::generate();

        let event = testing::legacy_event(&bob, &carol.public_key(), "hi carol", 100);
        let status = h.engine.handle_event(&event, None).await.unwrap();
        assert_eq!(status, IngestStatus::Dropped);

        let note = EventBuilder::text_note("hello")
            .sign_with_keys(&bob)
            .unwrap();
        let status = h.engine.handle_event(&note, None).await.unwrap();
        assert_eq!(status, IngestStatus::Dropped);
    }

    #[tokio::test]
    async fn test_message_sent_from_another_device() {
        let h = harness();
        let bob = Keys::generate();

        // Authored by the account elsewhere: accepted right away
        let event = testing::legacy_event(&h.keys, &bob.public_key(), "from my phone", 100);
        let status = h.engine.handle_event(&event, None).await.unwrap();
        assert_eq!(status, IngestStatus::Ingested);

        let key = ConversationKey::from_public_keys([bob.public_key(), h.keys.public_key()]);
        let record = h.engine.conversation(&key).await.unwrap();
        assert!(record.accepted);
        assert_eq!(record.unread, 0);

        let messages = h.engine.messages(&key).await.unwrap();
        assert_eq!(messages[0].content, "from my phone");
    }

    #[tokio::test]
    async fn test_echo_of_sent_messages() {
        let h = harness();
        let bob = Keys::generate();
        let relay = testing::url("wss://write.example.com");

        // Legacy
        let output = h
            .engine
            .send_message([bob.public_key()], "legacy")
            .await
            .unwrap();
        let event: Event = h.transport.sent_events().remove(0);
        let status = h.engine.handle_event(&event, Some(&relay)).await.unwrap();
        assert_eq!(status, IngestStatus::Duplicate);

        let messages = h
            .engine
            .messages(&output.message.conversation)
            .await
            .unwrap();
        assert_eq!(messages.len(), 1);
        assert!(messages[0].relays.contains(&relay));

        // Modern self copy
        h.engine
            .set_protocol_version(&output.message.conversation, ProtocolVersion::Modern)
            .await
            .unwrap();
        let output = h
            .engine
            .send_message([bob.public_key()], "modern")
            .await
            .unwrap();
        let self_wrap: Event = h
            .transport
            .sent_events()
            .into_iter()
            .find(|e| {
                e.kind == Kind::GiftWrap
                    && e.tags.public_keys().any(|pk| pk == &h.keys.public_key())
            })
            .unwrap();
        let status = h.engine.handle_event(&self_wrap, None).await.unwrap();
        assert_eq!(status, IngestStatus::Duplicate);

        let messages = h
            .engine
            .messages(&output.message.conversation)
            .await
            .unwrap();
        assert_eq!(messages.len(), 2);
    }

    #[tokio::test]
    async fn test_read_only_account_can_not_ingest() {
        let account = DmAccount::read_only(Keys::generate().public_key());
        let engine = DmEngine::new(account, MockTransport::new());

        let event = testing::legacy_event(&Keys::generate(), &engine.public_key(), "hi", 100);
        assert!(matches!(
            engine.handle_event(&event, None).await,
            Err(Error::MissingPrivateKey)
        ));
    }
}
