// Copyright (c) 2022-2023 Yuki Kishimoto
// Copyright (c) 2023-2025 Rust Nostr Developers
// Distributed under the MIT software license

//! Direct messages

use std::collections::{BTreeMap, HashSet};

use nostr::{EventId, Kind, PublicKey, RelayUrl, Timestamp};

use crate::constant::SECS_PER_DAY;
use crate::key::ConversationKey;

/// Message kind
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum MessageKind {
    /// NIP-04 encrypted direct message (kind 4)
    Legacy,
    /// NIP-17 private direct message, delivered in a NIP-59 gift wrap (rumor kind 14)
    Modern,
}

impl MessageKind {
    /// Get the [`Kind`] of the event carrying the plaintext
    ///
    /// For modern messages this is the kind of the rumor, not of the gift wrap.
    pub fn to_event_kind(&self) -> Kind {
        match self {
            Self::Legacy => Kind::EncryptedDirectMessage,
            Self::Modern => Kind::PrivateDirectMessage,
        }
    }

    /// Map an event kind to a message kind
    pub fn from_event_kind(kind: Kind) -> Option<Self> {
        match kind {
            Kind::EncryptedDirectMessage => Some(Self::Legacy),
            Kind::PrivateDirectMessage => Some(Self::Modern),
            _ => None,
        }
    }
}

/// Decrypted direct message
///
/// For legacy messages the ID is the ID of the signed kind 4 event;
/// for modern messages it's the ID of the rumor (the gift wrap IDs are never exposed).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DirectMessage {
    /// Message ID
    pub id: EventId,
    /// Owning conversation
    pub conversation: ConversationKey,
    /// Author
    pub sender: PublicKey,
    /// Creation timestamp
    pub created_at: Timestamp,
    /// Plaintext content
    pub content: String,
    /// Kind
    pub kind: MessageKind,
    /// Relays where the message has been seen or confirmed
    pub relays: HashSet<RelayUrl>,
}

impl DirectMessage {
    /// Check if the message was sent by `public_key`
    #[inline]
    pub fn is_from(&self, public_key: &PublicKey) -> bool {
        &self.sender == public_key
    }

    /// UTC day number of the message
    #[inline]
    pub fn day(&self) -> u64 {
        self.created_at.as_secs() / SECS_PER_DAY
    }
}

/// Most recent message
pub fn most_recent(messages: &[DirectMessage]) -> Option<&DirectMessage> {
    messages.iter().max_by_key(|m| m.created_at)
}

/// Group messages by UTC day
///
/// Days are ascending, and messages are sorted by creation timestamp within each day.
pub fn group_by_day<I>(messages: I) -> Vec<(u64, Vec<DirectMessage>)>
where
    I: IntoIterator<Item = DirectMessage>,
{
    let mut days: BTreeMap<u64, Vec<DirectMessage>> = BTreeMap::new();

    for message in messages.into_iter() {
        days.entry(message.day()).or_default().push(message);
    }

    days.into_iter()
        .map(|(day, mut messages)| {
            messages.sort_by_key(|m| m.created_at);
            (day, messages)
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use nostr::Keys;

    use super::*;
    use crate::testing;

    #[test]
    fn test_kind_mapping() {
        assert_eq!(MessageKind::Legacy.to_event_kind().as_u16(), 4);
        assert_eq!(MessageKind::Modern.to_event_kind().as_u16(), 14);
        assert_eq!(
            MessageKind::from_event_kind(Kind::GiftWrap),
            None,
            "gift wraps never carry plaintext"
        );
    }

    #[test]
    fn test_group_by_day() {
        let sender = Keys::generate().public_key();
        let day = SECS_PER_DAY;

        let messages = vec![
            testing::message(sender, 2 * day + 50, MessageKind::Modern),
            testing::message(sender, day + 10, MessageKind::Legacy),
            testing::message(sender, 2 * day + 5, MessageKind::Modern),
        ];

        let grouped = group_by_day(messages);
        assert_eq!(grouped.len(), 2);
        assert_eq!(grouped[0].0, 1);
        assert_eq!(grouped[1].0, 2);
        assert_eq!(grouped[1].1[0].created_at.as_secs(), 2 * day + 5);
        assert_eq!(grouped[1].1[1].created_at.as_secs(), 2 * day + 50);
    }

    #[test]
    fn test_most_recent() {
        let sender = Keys::generate().public_key();
        let messages = vec![
            testing::message(sender, 10, MessageKind::Legacy),
            testing::message(sender, 30, MessageKind::Modern),
            testing::message(sender, 20, MessageKind::Legacy),
        ];

        let latest = most_recent(&messages).unwrap();
        assert_eq!(latest.created_at.as_secs(), 30);
        assert!(most_recent(&[]).is_none());
    }
}
