// Copyright (c) 2022-2023 Yuki Kishimoto
// Copyright (c) 2023-2025 Rust Nostr Developers
// Distributed under the MIT software license

//! Conversation participants and keys

use std::collections::BTreeSet;
use std::fmt;
use std::iter;

use nostr::{Event, PublicKey, UnsignedEvent};

/// Conversation participants
///
/// Always includes the sender of the messages. Deduplicated and sorted.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct Participants(BTreeSet<PublicKey>);

impl Participants {
    /// Construct from public keys
    pub fn new<I>(public_keys: I) -> Self
    where
        I: IntoIterator<Item = PublicKey>,
    {
        Self(public_keys.into_iter().collect())
    }

    /// Participants of an event: author + `p` tags
    pub fn from_event(event: &Event) -> Self {
        Self::new(
            event
                .tags
                .public_keys()
                .copied()
                .chain(iter::once(event.pubkey)),
        )
    }

    /// Participants of a rumor: author + `p` tags
    pub fn from_rumor(rumor: &UnsignedEvent) -> Self {
        Self::new(
            rumor
                .tags
                .public_keys()
                .copied()
                .chain(iter::once(rumor.pubkey)),
        )
    }

    /// Number of participants
    #[inline]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Check if there are no participants
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Check if a public key is a participant
    #[inline]
    pub fn contains(&self, public_key: &PublicKey) -> bool {
        self.0.contains(public_key)
    }

    /// Check if it's a group conversation (more than 2 participants)
    #[inline]
    pub fn is_group(&self) -> bool {
        self.0.len() > 2
    }

    /// Iterate participants
    #[inline]
    pub fn iter(&self) -> impl Iterator<Item = &PublicKey> {
        self.0.iter()
    }

    /// All participants except `account`
    pub fn receivers<'a>(&'a self, account: &'a PublicKey) -> impl Iterator<Item = &'a PublicKey> {
        self.0.iter().filter(move |pk| *pk != account)
    }

    /// The other participant of a two-party conversation
    ///
    /// Returns `None` for groups and for conversations with self.
    pub fn counterpart(&self, account: &PublicKey) -> Option<PublicKey> {
        if self.0.len() != 2 {
            return None;
        }

        self.receivers(account).next().copied()
    }

    /// Derive the conversation key
    #[inline]
    pub fn key(&self) -> ConversationKey {
        ConversationKey::new(self)
    }
}

impl FromIterator<PublicKey> for Participants {
    fn from_iter<T: IntoIterator<Item = PublicKey>>(iter: T) -> Self {
        Self::new(iter)
    }
}

/// Conversation key
///
/// Deterministic identifier derived from the sorted, deduplicated set of participant public keys:
/// `{A, B}` and `{B, A}` yield the same key.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ConversationKey(String);

impl ConversationKey {
    /// Separator between the hex public keys
    pub const SEPARATOR: char = ':';

    /// Derive key from participants
    pub fn new(participants: &Participants) -> Self {
        let mut hex: Vec<String> = participants.iter().map(|pk| pk.to_hex()).collect();

        // Sort by hex, so the key doesn't depend on the in-memory ordering of the keys
        hex.sort();

        Self(hex.join(&Self::SEPARATOR.to_string()))
    }

    /// Derive the key from any list of public keys (duplicates are ignored)
    #[inline]
    pub fn from_public_keys<I>(public_keys: I) -> Self
    where
        I: IntoIterator<Item = PublicKey>,
    {
        Self::new(&Participants::new(public_keys))
    }

    /// Get as `&str`
    #[inline]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ConversationKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}
