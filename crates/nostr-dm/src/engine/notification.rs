// Copyright (c) 2022-2023 Yuki Kishimoto
// Copyright (c) 2023-2025 Rust Nostr Developers
// Distributed under the MIT software license

use nostr::EventId;

use crate::delivery::RecipientResult;
use crate::key::ConversationKey;
use crate::message::DirectMessage;

/// Engine notification
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DmNotification {
    /// New message stored, sent or received
    NewMessage {
        /// Message
        message: Box<DirectMessage>,
    },
    /// The delivery result of a recipient changed
    DeliveryUpdated {
        /// Message ID
        message_id: EventId,
        /// Conversation
        conversation: ConversationKey,
        /// Updated result
        result: RecipientResult,
    },
    /// Conversation flags, read state or unread count changed
    ConversationUpdated {
        /// Conversation
        conversation: ConversationKey,
    },
    /// An unsent message has been removed
    MessageRemoved {
        /// Message ID
        message_id: EventId,
        /// Conversation
        conversation: ConversationKey,
    },
    /// A rescan window has been requested
    RescanProgress {
        /// Window index, starting from `0` for the most recent one
        months_ago: u32,
        /// Total number of windows
        total: u32,
    },
}
