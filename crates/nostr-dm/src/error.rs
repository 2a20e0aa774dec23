// Copyright (c) 2022-2023 Yuki Kishimoto
// Copyright (c) 2023-2025 Rust Nostr Developers
// Distributed under the MIT software license

//! Errors

use std::fmt;

use nostr::event::builder;
use nostr::EventId;

use crate::crypto::EncryptionError;
use crate::key::ConversationKey;
use crate::store::StoreError;
use crate::transport::TransportError;

/// Engine error
#[derive(Debug)]
pub enum Error {
    /// The account has no private key
    MissingPrivateKey,
    /// Encryption error
    Encryption(EncryptionError),
    /// [`EventBuilder`](nostr::EventBuilder) error
    EventBuilder(builder::Error),
    /// Store error
    Store(StoreError),
    /// Transport error
    Transport(TransportError),
    /// Conversation not found
    ConversationNotFound(ConversationKey),
    /// Message not found
    MessageNotFound(EventId),
    /// No participants other than the account
    EmptyParticipants,
}

impl std::error::Error for Error {}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::MissingPrivateKey => write!(f, "private key not available"),
            Self::Encryption(e) => write!(f, "{e}"),
            Self::EventBuilder(e) => write!(f, "{e}"),
            Self::Store(e) => write!(f, "{e}"),
            Self::Transport(e) => write!(f, "{e}"),
            Self::ConversationNotFound(key) => write!(f, "conversation not found: {key}"),
            Self::MessageNotFound(id) => write!(f, "message not found: {id}"),
            Self::EmptyParticipants => write!(f, "no participants"),
        }
    }
}

impl From<EncryptionError> for Error {
    fn from(e: EncryptionError) -> Self {
        Self::Encryption(e)
    }
}

impl From<builder::Error> for Error {
    fn from(e: builder::Error) -> Self {
        Self::EventBuilder(e)
    }
}

impl From<StoreError> for Error {
    fn from(e: StoreError) -> Self {
        Self::Store(e)
    }
}

impl From<TransportError> for Error {
    fn from(e: TransportError) -> Self {
        Self::Transport(e)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::directory::DirectoryError;

    #[test]
    fn test_backend_errors_display_their_source() {
        let e: Error = EncryptionError::backend("bad ciphertext").into();
        assert_eq!(e.to_string(), "bad ciphertext");

        let e: Error = StoreError::backend("disk full").into();
        assert_eq!(e.to_string(), "disk full");

        let e: Error = TransportError::backend("socket closed").into();
        assert_eq!(e.to_string(), "socket closed");

        let e = DirectoryError::backend("no route");
        assert_eq!(e.to_string(), "no route");

        assert_eq!(Error::EmptyParticipants.to_string(), "no participants");
    }
}
