// Copyright (c) 2022-2023 Yuki Kishimoto
// Copyright (c) 2023-2025 Rust Nostr Developers
// Distributed under the MIT software license

//! Protocol version

use std::fmt;

use crate::message::{self, DirectMessage, MessageKind};

/// Conversation protocol version
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum ProtocolVersion {
    /// NIP-04 encrypted direct messages
    Legacy,
    /// NIP-17 gift-wrapped private messages
    Modern,
}

impl fmt::Display for ProtocolVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Legacy => f.write_str("nip04"),
            Self::Modern => f.write_str("nip17"),
        }
    }
}

impl ProtocolVersion {
    /// Persisted tag of [`ProtocolVersion::Legacy`]
    pub const LEGACY_TAG: u8 = 0;
    /// Persisted tag of [`ProtocolVersion::Modern`]
    pub const MODERN_TAG: u8 = 4;
    /// Alternative persisted tag of [`ProtocolVersion::Modern`] (the NIP number)
    pub const MODERN_NIP_TAG: u8 = 17;

    /// Persisted integer tag
    #[inline]
    pub fn as_tag(&self) -> u8 {
        match self {
            Self::Legacy => Self::LEGACY_TAG,
            Self::Modern => Self::MODERN_TAG,
        }
    }

    /// Parse a persisted integer tag
    ///
    /// Returns `None` for unknown tags.
    pub fn from_tag(tag: u8) -> Option<Self> {
        match tag {
            Self::LEGACY_TAG => Some(Self::Legacy),
            Self::MODERN_TAG | Self::MODERN_NIP_TAG => Some(Self::Modern),
            _ => None,
        }
    }

    /// Check if it's [`ProtocolVersion::Modern`]
    #[inline]
    pub fn is_modern(&self) -> bool {
        matches!(self, Self::Modern)
    }

    /// Message kind produced when sending with this version
    #[inline]
    pub fn message_kind(&self) -> MessageKind {
        match self {
            Self::Legacy => MessageKind::Legacy,
            Self::Modern => MessageKind::Modern,
        }
    }
}

impl From<MessageKind> for ProtocolVersion {
    fn from(kind: MessageKind) -> Self {
        match kind {
            MessageKind::Legacy => Self::Legacy,
            MessageKind::Modern => Self::Modern,
        }
    }
}

/// Input of the version selection that requires a DM relay lookup
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VersionDecision {
    /// Version is decided
    Decided(ProtocolVersion),
    /// Depends on whether the sole recipient publishes DM relays
    NeedsRelayLookup,
}

/// Apply the rules that don't need any network round trip
///
/// Evaluated in order, first match wins:
/// 1. more than 2 participants: [`ProtocolVersion::Modern`];
/// 2. most recent message is modern: [`ProtocolVersion::Modern`];
/// 3. no prior messages: depends on the recipient DM relays ([`VersionDecision::NeedsRelayLookup`]);
/// 4. otherwise [`ProtocolVersion::Legacy`].
pub fn decide(participants: usize, messages: &[DirectMessage]) -> VersionDecision {
    if participants > 2 {
        return VersionDecision::Decided(ProtocolVersion::Modern);
    }

    match message::most_recent(messages) {
        Some(latest) if latest.kind == MessageKind::Modern => {
            VersionDecision::Decided(ProtocolVersion::Modern)
        }
        Some(_) => VersionDecision::Decided(ProtocolVersion::Legacy),
        None => VersionDecision::NeedsRelayLookup,
    }
}

/// Complete the decision once the DM relay lookup is done
#[inline]
pub fn with_relay_lookup(recipient_has_dm_relays: bool) -> ProtocolVersion {
    if recipient_has_dm_relays {
        ProtocolVersion::Modern
    } else {
        ProtocolVersion::Legacy
    }
}

#[cfg(test)]
mod tests {
    use nostr::Keys;

    use super::*;
    use crate::testing;

    #[test]
    fn test_tags() {
        assert_eq!(ProtocolVersion::Legacy.as_tag(), 0);
        assert_eq!(ProtocolVersion::Modern.as_tag(), 4);
        assert_eq!(ProtocolVersion::from_tag(0), Some(ProtocolVersion::Legacy));
        assert_eq!(ProtocolVersion::from_tag(4), Some(ProtocolVersion::Modern));
        assert_eq!(ProtocolVersion::from_tag(17), Some(ProtocolVersion::Modern));
        assert_eq!(ProtocolVersion::from_tag(1), None);
    }

    #[test]
    fn test_group_is_always_modern() {
        let sender = Keys::generate().public_key();
        let history = vec![testing::message(sender, 100, MessageKind::Legacy)];

        assert_eq!(
            decide(3, &history),
            VersionDecision::Decided(ProtocolVersion::Modern)
        );
        assert_eq!(decide(5, &[]), VersionDecision::Decided(ProtocolVersion::Modern));
    }

    #[test]
    fn test_latest_modern_sticks() {
        let sender = Keys::generate().public_key();
        let history = vec![
            testing::message(sender, 100, MessageKind::Legacy),
            testing::message(sender, 200, MessageKind::Modern),
            testing::message(sender, 150, MessageKind::Legacy),
        ];

        assert_eq!(
            decide(2, &history),
            VersionDecision::Decided(ProtocolVersion::Modern)
        );
    }

    #[test]
    fn test_latest_legacy() {
        let sender = Keys::generate().public_key();
        let history = vec![
            testing::message(sender, 200, MessageKind::Legacy),
            testing::message(sender, 100, MessageKind::Modern),
        ];

        assert_eq!(
            decide(2, &history),
            VersionDecision::Decided(ProtocolVersion::Legacy)
        );
    }

    #[test]
    fn test_no_history_needs_lookup() {
        assert_eq!(decide(2, &[]), VersionDecision::NeedsRelayLookup);
        assert_eq!(with_relay_lookup(true), ProtocolVersion::Modern);
        assert_eq!(with_relay_lookup(false), ProtocolVersion::Legacy);
    }
}
