// Copyright (c) 2022-2023 Yuki Kishimoto
// Copyright (c) 2023-2025 Rust Nostr Developers
// Distributed under the MIT software license

//! Conversation record

use nostr::{PublicKey, Timestamp};

use crate::key::{ConversationKey, Participants};
use crate::message::{DirectMessage, MessageKind};
use crate::version::ProtocolVersion;

/// Persisted conversation state, as seen by one account
///
/// Conversations are never deleted, only hidden.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConversationRecord {
    /// Conversation key
    pub key: ConversationKey,
    /// Local account owning this record
    pub account: PublicKey,
    /// All participants, including the account
    pub participants: Participants,
    /// Stored protocol version
    pub version: Option<ProtocolVersion>,
    /// Accepted by the account
    pub accepted: bool,
    /// Hidden by the account
    pub hidden: bool,
    /// Pinned by the account
    pub pinned: bool,
    /// Author of the first message
    pub initiator: Option<PublicKey>,
    /// Last time the conversation was marked as read
    pub last_read: Option<Timestamp>,
    /// Timestamp of the most recent message
    pub last_message_at: Option<Timestamp>,
    /// Cached unread count
    pub unread: usize,
}

impl ConversationRecord {
    /// New conversation record, not accepted
    pub fn new(account: PublicKey, participants: Participants) -> Self {
        Self {
            key: participants.key(),
            account,
            participants,
            version: None,
            accepted: false,
            hidden: false,
            pinned: false,
            initiator: None,
            last_read: None,
            last_message_at: None,
            unread: 0,
        }
    }

    /// The other participant, if it's a two-party conversation
    #[inline]
    pub fn counterpart(&self) -> Option<PublicKey> {
        self.participants.counterpart(&self.account)
    }

    /// Check if it's a group conversation
    #[inline]
    pub fn is_group(&self) -> bool {
        self.participants.is_group()
    }

    /// Check if the account started this conversation
    #[inline]
    pub fn is_initiated_by_account(&self) -> bool {
        self.initiator == Some(self.account)
    }

    /// Persisted version tag
    #[inline]
    pub fn version_tag(&self) -> Option<u8> {
        self.version.map(|v| v.as_tag())
    }

    /// Set the version from a persisted tag
    ///
    /// Unknown tags leave the version untouched and return `false`.
    pub fn set_version_tag(&mut self, tag: u8) -> bool {
        match ProtocolVersion::from_tag(tag) {
            Some(version) => {
                self.version = Some(version);
                true
            }
            None => false,
        }
    }

    /// Count the messages newer than the last read timestamp
    pub fn count_unread(&self, messages: &[DirectMessage]) -> usize {
        match self.last_read {
            Some(last_read) => messages.iter().filter(|m| m.created_at > last_read).count(),
            None => messages.len(),
        }
    }

    /// Recompute the cached unread count
    #[inline]
    pub fn recompute_unread(&mut self, messages: &[DirectMessage]) {
        self.unread = self.count_unread(messages);
    }

    /// Mark as read at `now` and recompute the unread count
    pub fn mark_read(&mut self, now: Timestamp, messages: &[DirectMessage]) {
        self.last_read = Some(now);
        self.recompute_unread(messages);
    }

    /// Update state for a new message of this conversation
    ///
    /// The author of the first message is the initiator, and the conversation is accepted only if
    /// the account sent it. Later, a message sent by the account accepts the conversation and
    /// advances the last read timestamp.
    ///
    /// The unread count is NOT recomputed.
    pub fn apply_message(&mut self, message: &DirectMessage) {
        let from_account: bool = message.is_from(&self.account);

        if self.initiator.is_none() {
            self.initiator = Some(message.sender);
            self.accepted = from_account;
        } else if from_account {
            self.accepted = true;
        }

        if from_account {
            self.last_read = Some(match self.last_read {
                Some(last_read) => last_read.max(message.created_at),
                None => message.created_at,
            });
        }

        if self
            .last_message_at
            .is_none_or(|last| message.created_at > last)
        {
            self.last_message_at = Some(message.created_at);
        }

        // Once upgraded, stay modern
        if message.kind == MessageKind::Modern {
            self.version = Some(ProtocolVersion::Modern);
        }
    }
}
