// Copyright (c) 2022-2023 Yuki Kishimoto
// Copyright (c) 2023-2025 Rust Nostr Developers
// Distributed under the MIT software license

//! Test helpers

use std::collections::HashSet;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Mutex, PoisonError};

use nostr::nips::nip04;
use nostr::util::BoxedFuture;
use nostr::{
    Event, EventBuilder, EventId, Filter, Keys, Kind, PublicKey, RelayUrl, Tag, Timestamp,
};
use tokio::sync::broadcast;

use crate::key::ConversationKey;
use crate::message::{DirectMessage, MessageKind};
use crate::transport::{RelayAck, RelayTransport, TransportError};

static NEXT_ID: AtomicU64 = AtomicU64::new(1);

pub(crate) fn ts(secs: u64) -> Timestamp {
    Timestamp::from(secs)
}

pub(crate) fn url(url: &str) -> RelayUrl {
    RelayUrl::parse(url).unwrap()
}

/// Message with a unique ID, not bound to any real conversation
pub(crate) fn message(sender: PublicKey, secs: u64, kind: MessageKind) -> DirectMessage {
    let n: u64 = NEXT_ID.fetch_add(1, Ordering::SeqCst);
    let mut bytes = [0u8; 32];
    bytes[..8].copy_from_slice(&n.to_be_bytes());

    DirectMessage {
        id: EventId::from_byte_array(bytes),
        conversation: ConversationKey::from_public_keys([sender]),
        sender,
        created_at: ts(secs),
        content: format!("message {n}"),
        kind,
        relays: HashSet::new(),
    }
}

/// Transport recording everything it's asked to do
#[derive(Debug)]
pub(crate) struct MockTransport {
    connected: Mutex<HashSet<RelayUrl>>,
    sent: Mutex<Vec<(Event, HashSet<RelayUrl>)>>,
    ephemeral: Mutex<Vec<(Event, RelayUrl)>>,
    history: Mutex<Vec<Vec<Filter>>>,
    acks: broadcast::Sender<RelayAck>,
}

impl MockTransport {
    pub(crate) fn new() -> Self {
        let (acks, ..) = broadcast::channel(1024);
        Self {
            connected: Mutex::new(HashSet::new()),
            sent: Mutex::new(Vec::new()),
            ephemeral: Mutex::new(Vec::new()),
            history: Mutex::new(Vec::new()),
            acks,
        }
    }

    pub(crate) fn connect(&self, relay_url: RelayUrl) {
        self.connected
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(relay_url);
    }

    pub(crate) fn sent(&self) -> Vec<(Event, HashSet<RelayUrl>)> {
        self.sent
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub(crate) fn ephemeral(&self) -> Vec<(Event, RelayUrl)> {
        self.ephemeral
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub(crate) fn history_requests(&self) -> Vec<Vec<Filter>> {
        self.history
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Events sent, both over persistent and one-shot connections
    pub(crate) fn sent_events(&self) -> Vec<Event> {
        self.sent()
            .into_iter()
            .map(|(event, ..)| event)
            .chain(self.ephemeral().into_iter().map(|(event, ..)| event))
            .collect()
    }

    pub(crate) fn ack(&self, ack: RelayAck) {
        let _ = self.acks.send(ack);
    }
}

impl RelayTransport for MockTransport {
    fn is_connected<'a>(&'a self, relay_url: &'a RelayUrl) -> BoxedFuture<'a, bool> {
        Box::pin(async move {
            self.connected
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .contains(relay_url)
        })
    }

    fn send<'a>(
        &'a self,
        event: &'a Event,
        relays: &'a HashSet<RelayUrl>,
    ) -> BoxedFuture<'a, Result<(), TransportError>> {
        Box::pin(async move {
            self.sent
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .push((event.clone(), relays.clone()));
            Ok(())
        })
    }

    fn send_ephemeral<'a>(
        &'a self,
        event: &'a Event,
        relay_url: &'a RelayUrl,
    ) -> BoxedFuture<'a, Result<(), TransportError>> {
        Box::pin(async move {
            self.ephemeral
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .push((event.clone(), relay_url.clone()));
            Ok(())
        })
    }

    fn fetch_history(&self, filters: Vec<Filter>) -> BoxedFuture<'_, Result<(), TransportError>> {
        Box::pin(async move {
            self.history
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .push(filters);
            Ok(())
        })
    }

    fn acknowledgements(&self) -> broadcast::Receiver<RelayAck> {
        self.acks.subscribe()
    }
}

/// Signed legacy direct message
pub(crate) fn legacy_event(sender: &Keys, receiver: &PublicKey, content: &str, secs: u64) -> Event {
    let ciphertext = nip04::encrypt(sender.secret_key(), receiver, content).unwrap();

    EventBuilder::new(Kind::EncryptedDirectMessage, ciphertext)
        .tag(Tag::public_key(*receiver))
        .custom_created_at(ts(secs))
        .sign_with_keys(sender)
        .unwrap()
}
