// Copyright (c) 2022-2023 Yuki Kishimoto
// Copyright (c) 2023-2025 Rust Nostr Developers
// Distributed under the MIT software license

//! Encrypted direct message conversation engine.
//!
//! Supports both the legacy NIP-04 encrypted direct messages and the gift-wrapped NIP-17 private
//! messages, with per-recipient multi-relay delivery tracking and conversation classification.
//!
//! <https://github.com/nostr-protocol/nips/blob/master/04.md>
//! <https://github.com/nostr-protocol/nips/blob/master/17.md>

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(rustdoc::bare_urls)]
#![warn(clippy::large_futures)]

pub mod classifier;
pub mod constant;
pub mod conversation;
pub mod crypto;
mod dedup;
pub mod delivery;
pub mod directory;
pub mod engine;
pub mod error;
pub mod key;
pub mod memory;
pub mod message;
pub mod options;
pub mod prelude;
pub mod rescan;
pub mod store;
pub mod tracker;
pub mod transport;
pub mod trust;
pub mod version;

#[cfg(test)]
mod testing;

pub use self::classifier::{ConversationBuckets, ConversationClassifier};
pub use self::conversation::ConversationRecord;
pub use self::crypto::{EncryptionProvider, NostrEncryption};
pub use self::delivery::{DeliveryState, RecipientResult};
pub use self::directory::DmRelayDirectory;
pub use self::engine::{
    DmAccount, DmEngine, DmEngineBuilder, DmNotification, IngestStatus, SendOutput,
};
pub use self::error::Error;
pub use self::key::{ConversationKey, Participants};
pub use self::message::{DirectMessage, MessageKind};
pub use self::options::DmOptions;
pub use self::store::ConversationStore;
pub use self::tracker::CorrelationTracker;
pub use self::transport::{RelayAck, RelayTransport};
pub use self::trust::TrustPolicy;
pub use self::version::ProtocolVersion;
