// Copyright (c) 2022-2023 Yuki Kishimoto
// Copyright (c) 2023-2025 Rust Nostr Developers
// Distributed under the MIT software license

//! Delivery tracking
//!
//! Per-recipient, per-relay results of outbound messages.
//! All the mutations go through the [`DeliveryLedger`], owned by the engine behind a single lock.

use std::collections::{HashMap, HashSet};
use std::fmt;
use std::num::NonZeroUsize;

use lru::LruCache;
use nostr::{Event, EventId, PublicKey, RelayUrl};

use crate::key::ConversationKey;

/// Delivery state of a message on a relay
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DeliveryState {
    /// Waiting for the relay `OK`
    Sending,
    /// Relay accepted the event
    Success,
    /// No positive `OK` before the deadline
    Timeout,
}

impl fmt::Display for DeliveryState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Sending => f.write_str("sending"),
            Self::Success => f.write_str("success"),
            Self::Timeout => f.write_str("timeout"),
        }
    }
}

impl DeliveryState {
    /// Check if it's a terminal state
    #[inline]
    pub fn is_terminal(&self) -> bool {
        !matches!(self, Self::Sending)
    }
}

/// Delivery result for a single recipient
///
/// Relay states only move from [`DeliveryState::Sending`] to a terminal state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecipientResult {
    /// Recipient
    pub recipient: PublicKey,
    /// State per relay
    pub relays: HashMap<RelayUrl, DeliveryState>,
}

impl RecipientResult {
    /// Terminal result of a recipient without relays
    #[inline]
    pub fn no_relays(recipient: PublicKey) -> Self {
        Self {
            recipient,
            relays: HashMap::new(),
        }
    }

    /// New result with every relay in [`DeliveryState::Sending`]
    pub fn sending<'a, I>(recipient: PublicKey, relays: I) -> Self
    where
        I: IntoIterator<Item = &'a RelayUrl>,
    {
        Self {
            recipient,
            relays: relays
                .into_iter()
                .map(|url| (url.clone(), DeliveryState::Sending))
                .collect(),
        }
    }

    /// Check if no relay was found for the recipient
    #[inline]
    pub fn is_no_relays(&self) -> bool {
        self.relays.is_empty()
    }

    /// Check if every relay reached a terminal state
    #[inline]
    pub fn is_complete(&self) -> bool {
        self.relays.values().all(DeliveryState::is_terminal)
    }

    /// Relays that accepted the message
    pub fn successes(&self) -> impl Iterator<Item = &RelayUrl> {
        self.relays
            .iter()
            .filter(|(_, state)| **state == DeliveryState::Success)
            .map(|(url, _)| url)
    }

    /// Mark a relay as succeeded
    ///
    /// Returns `false` if the relay is unknown or already in a terminal state.
    pub fn mark_success(&mut self, relay_url: &RelayUrl) -> bool {
        match self.relays.get_mut(relay_url) {
            Some(state) if *state == DeliveryState::Sending => {
                *state = DeliveryState::Success;
                true
            }
            _ => false,
        }
    }

    /// Mark all the relays still sending as timed out
    ///
    /// Returns `false` if nothing changed.
    pub fn mark_timeout(&mut self) -> bool {
        let mut changed: bool = false;

        for state in self.relays.values_mut() {
            if *state == DeliveryState::Sending {
                *state = DeliveryState::Timeout;
                changed = true;
            }
        }

        changed
    }
}

/// Unit of work for a single recipient of an outbound message
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SendJob {
    /// Originating message
    pub message_id: EventId,
    /// Recipient
    pub recipient: PublicKey,
    /// Relays of the recipient at send time
    pub relays: HashSet<RelayUrl>,
    /// Wire event
    pub wrap: Event,
}

impl SendJob {
    /// ID of the wire event, the one acknowledged by relays
    #[inline]
    pub fn wire_id(&self) -> EventId {
        self.wrap.id
    }
}

/// Correlation key of a relay acknowledgement
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct DeliveryKey {
    /// Wire event ID
    pub event_id: EventId,
    /// Relay URL
    pub relay_url: RelayUrl,
}

impl DeliveryKey {
    /// New delivery key
    #[inline]
    pub fn new(event_id: EventId, relay_url: RelayUrl) -> Self {
        Self {
            event_id,
            relay_url,
        }
    }
}

/// A recipient result that changed
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct DeliveryUpdate {
    pub message_id: EventId,
    pub conversation: ConversationKey,
    pub result: RecipientResult,
}

#[derive(Debug, Clone, Copy)]
struct WrapRef {
    message_id: EventId,
    recipient: PublicKey,
    is_self: bool,
}

#[derive(Debug)]
struct MessageDelivery {
    conversation: ConversationKey,
    results: HashMap<PublicKey, RecipientResult>,
    jobs: HashMap<PublicKey, SendJob>,
    wraps: HashSet<EventId>,
}

/// Ledger of the delivery results of the most recent outbound messages
#[derive(Debug)]
pub(crate) struct DeliveryLedger {
    messages: LruCache<EventId, MessageDelivery>,
    wraps: HashMap<EventId, WrapRef>,
}

impl DeliveryLedger {
    pub(crate) fn new(capacity: NonZeroUsize) -> Self {
        Self {
            messages: LruCache::new(capacity),
            wraps: HashMap::new(),
        }
    }

    /// Start tracking an outbound message
    pub(crate) fn track(&mut self, message_id: EventId, conversation: ConversationKey) {
        let delivery = MessageDelivery {
            conversation,
            results: HashMap::new(),
            jobs: HashMap::new(),
            wraps: HashSet::new(),
        };

        if let Some((evicted_id, evicted)) = self.messages.push(message_id, delivery) {
            if evicted_id != message_id {
                tracing::trace!(id = %evicted_id, "Evicting delivery results.");
            }

            for wrap_id in evicted.wraps.iter() {
                self.wraps.remove(wrap_id);
            }
        }
    }

    /// Record the terminal result of a recipient without relays
    pub(crate) fn record_no_relays(&mut self, message_id: &EventId, recipient: PublicKey) -> bool {
        match self.messages.get_mut(message_id) {
            Some(delivery) => {
                delivery
                    .results
                    .insert(recipient, RecipientResult::no_relays(recipient));
                true
            }
            None => false,
        }
    }

    /// Add a job, with all its relays in [`DeliveryState::Sending`]
    pub(crate) fn add_job(&mut self, job: SendJob, is_self: bool) -> bool {
        let Some(delivery) = self.messages.get_mut(&job.message_id) else {
            return false;
        };

        let wire_id: EventId = job.wire_id();

        delivery.results.insert(
            job.recipient,
            RecipientResult::sending(job.recipient, job.relays.iter()),
        );
        delivery.wraps.insert(wire_id);
        self.wraps.insert(
            wire_id,
            WrapRef {
                message_id: job.message_id,
                recipient: job.recipient,
                is_self,
            },
        );
        delivery.jobs.insert(job.recipient, job);

        true
    }

    /// Message owning the wire event, and whether it's the self-addressed copy
    #[inline]
    pub(crate) fn wrap_owner(&self, wire_id: &EventId) -> Option<(EventId, bool)> {
        self.wraps
            .get(wire_id)
            .map(|wrap| (wrap.message_id, wrap.is_self))
    }

    fn update<F>(&mut self, wire_id: &EventId, f: F) -> Option<DeliveryUpdate>
    where
        F: FnOnce(&mut RecipientResult) -> bool,
    {
        let wrap: WrapRef = *self.wraps.get(wire_id)?;
        let delivery: &mut MessageDelivery = self.messages.get_mut(&wrap.message_id)?;
        let result: &mut RecipientResult = delivery.results.get_mut(&wrap.recipient)?;

        if !f(result) {
            return None;
        }

        let result: RecipientResult = result.clone();

        // All relays resolved: the job is done
        if result.is_complete() {
            delivery.jobs.remove(&wrap.recipient);
        }

        Some(DeliveryUpdate {
            message_id: wrap.message_id,
            conversation: delivery.conversation.clone(),
            result,
        })
    }

    /// Mark a relay as succeeded
    ///
    /// Returns `None` if nothing changed (unknown or already terminal).
    pub(crate) fn mark_success(&mut self, key: &DeliveryKey) -> Option<DeliveryUpdate> {
        self.update(&key.event_id, |result| result.mark_success(&key.relay_url))
    }

    /// Time out every relay still sending for the recipient of the wire event
    ///
    /// Returns `None` if nothing changed.
    pub(crate) fn mark_timeout(&mut self, wire_id: &EventId) -> Option<DeliveryUpdate> {
        self.update(wire_id, RecipientResult::mark_timeout)
    }

    /// Stop tracking a message
    ///
    /// Returns the wire IDs of its jobs.
    pub(crate) fn cancel(&mut self, message_id: &EventId) -> Option<HashSet<EventId>> {
        let delivery: MessageDelivery = self.messages.pop(message_id)?;

        for wrap_id in delivery.wraps.iter() {
            self.wraps.remove(wrap_id);
        }

        Some(delivery.wraps)
    }

    /// Results of a message
    pub(crate) fn results(&self, message_id: &EventId) -> Option<Vec<RecipientResult>> {
        self.messages
            .peek(message_id)
            .map(|delivery| delivery.results.values().cloned().collect())
    }

    /// Jobs of a message still waiting for some relay
    pub(crate) fn active_jobs(&self, message_id: &EventId) -> Vec<SendJob> {
        self.messages
            .peek(message_id)
            .map(|delivery| delivery.jobs.values().cloned().collect())
            .unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use nostr::{EventBuilder, Keys, Kind};

    use super::*;

    fn url(s: &str) -> RelayUrl {
        RelayUrl::parse(s).unwrap()
    }

    fn job(message_id: EventId, recipient: PublicKey, relays: &[&RelayUrl]) -> SendJob {
        let keys = Keys::generate();
        let wrap = EventBuilder::new(Kind::GiftWrap, "wrap")
            .sign_with_keys(&keys)
            .unwrap();

        SendJob {
            message_id,
            recipient,
            relays: relays.iter().map(|u| (*u).clone()).collect(),
            wrap,
        }
    }

    #[test]
    fn test_recipient_result_is_monotonic() {
        let r1 = url("wss://r1.example.com");
        let r2 = url("wss://r2.example.com");
        let recipient = Keys::generate().public_key();

        let mut result = RecipientResult::sending(recipient, [&r1, &r2]);
        assert!(!result.is_complete());

        assert!(result.mark_success(&r1));
        // Don't succeed twice
        assert!(!result.mark_success(&r1));

        assert!(result.mark_timeout());
        assert!(!result.mark_timeout());

        // Never backward
        assert!(!result.mark_success(&r2));
        assert_eq!(result.relays[&r1], DeliveryState::Success);
        assert_eq!(result.relays[&r2], DeliveryState::Timeout);
        assert!(result.is_complete());
    }

    #[test]
    fn test_no_relays_is_terminal() {
        let result = RecipientResult::no_relays(Keys::generate().public_key());
        assert!(result.is_no_relays());
        assert!(result.is_complete());
    }

    #[test]
    fn test_ledger_updates() {
        let r1 = url("wss://r1.example.com");
        let r2 = url("wss://r2.example.com");
        let recipient = Keys::generate().public_key();
        let message_id = EventId::from_byte_array([1; 32]);
        let conversation = ConversationKey::from_public_keys([recipient]);

        let mut ledger = DeliveryLedger::new(NonZeroUsize::new(8).unwrap());
        ledger.track(message_id, conversation);

        let job = job(message_id, recipient, &[&r1, &r2]);
        let wire_id = job.wire_id();
        assert!(ledger.add_job(job, false));
        assert_eq!(ledger.active_jobs(&message_id).len(), 1);

        let update = ledger
            .mark_success(&DeliveryKey::new(wire_id, r1.clone()))
            .unwrap();
        assert_eq!(update.message_id, message_id);
        assert_eq!(update.result.successes().count(), 1);

        assert!(ledger
            .mark_success(&DeliveryKey::new(wire_id, r1.clone()))
            .is_none());

        assert!(ledger.mark_timeout(&wire_id).is_some());
        assert!(ledger.mark_timeout(&wire_id).is_none());

        // Job is destroyed once all relays resolved
        assert!(ledger.active_jobs(&message_id).is_empty());

        let results = ledger.results(&message_id).unwrap();
        assert_eq!(results[0].relays[&r1], DeliveryState::Success);
        assert_eq!(results[0].relays[&r2], DeliveryState::Timeout);
    }

    #[test]
    fn test_ledger_eviction_and_cancel() {
        let r1 = url("wss://r1.example.com");
        let recipient = Keys::generate().public_key();
        let conversation = ConversationKey::from_public_keys([recipient]);

        let mut ledger = DeliveryLedger::new(NonZeroUsize::new(1).unwrap());

        let first = EventId::from_byte_array([1; 32]);
        ledger.track(first, conversation.clone());
        let job = job(first, recipient, &[&r1]);
        let wire_id = job.wire_id();
        ledger.add_job(job, false);
        assert_eq!(ledger.wrap_owner(&wire_id), Some((first, false)));

        let second = EventId::from_byte_array([2; 32]);
        ledger.track(second, conversation);
        assert_eq!(ledger.wrap_owner(&wire_id), None);
        assert!(ledger.results(&first).is_none());

        assert!(ledger.record_no_relays(&second, recipient));
        assert!(ledger.cancel(&second).unwrap().is_empty());
        assert!(ledger.results(&second).is_none());
    }
}
