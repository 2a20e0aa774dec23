// Copyright (c) 2022-2023 Yuki Kishimoto
// Copyright (c) 2023-2025 Rust Nostr Developers
// Distributed under the MIT software license

//! Relay transport

use std::any::Any;
use std::collections::HashSet;
use std::fmt::{self, Debug};
use std::sync::Arc;

use nostr::util::BoxedFuture;
use nostr::{Event, EventId, Filter, RelayUrl};
use tokio::sync::broadcast;

/// Transport error
#[derive(Debug)]
pub enum TransportError {
    /// An error happened in the underlying transport.
    Backend(Box<dyn std::error::Error + Send + Sync>),
    /// Relay not reachable
    Unreachable(RelayUrl),
}

impl std::error::Error for TransportError {}

impl fmt::Display for TransportError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Backend(e) => fmt::Display::fmt(e, f),
            Self::Unreachable(url) => write!(f, "relay '{url}' not reachable"),
        }
    }
}

impl TransportError {
    /// Create a new backend error
    ///
    /// Shorthand for `Self::Backend(Box::new(error))`.
    #[inline]
    pub fn backend<E>(error: E) -> Self
    where
        E: Into<Box<dyn std::error::Error + Send + Sync>>,
    {
        Self::Backend(error.into())
    }
}

/// Relay `OK` acknowledgement
///
/// <https://github.com/nostr-protocol/nips/blob/master/01.md>
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RelayAck {
    /// ID of the acknowledged event
    pub event_id: EventId,
    /// Relay that sent the `OK`
    pub relay_url: RelayUrl,
    /// Accepted or rejected
    pub success: bool,
    /// Optional message (i.e., the rejection reason)
    pub message: Option<String>,
}

impl RelayAck {
    /// Accepted
    pub fn accepted(event_id: EventId, relay_url: RelayUrl) -> Self {
        Self {
            event_id,
            relay_url,
            success: true,
            message: None,
        }
    }

    /// Rejected
    pub fn rejected<S>(event_id: EventId, relay_url: RelayUrl, message: S) -> Self
    where
        S: Into<String>,
    {
        Self {
            event_id,
            relay_url,
            success: false,
            message: Some(message.into()),
        }
    }
}

/// Relay transport
///
/// The relay connection pool is a process-wide shared resource: the engine only asks for
/// relays by URL and never assumes a connection stays open.
/// Sends are fire-and-forget, results are delivered by [`RelayTransport::acknowledgements`].
pub trait RelayTransport: Any + Debug + Send + Sync {
    /// Check if a persistent connection to the relay is available
    fn is_connected<'a>(&'a self, relay_url: &'a RelayUrl) -> BoxedFuture<'a, bool>;

    /// Send an event to relays with a persistent connection
    fn send<'a>(
        &'a self,
        event: &'a Event,
        relays: &'a HashSet<RelayUrl>,
    ) -> BoxedFuture<'a, Result<(), TransportError>>;

    /// Send an event using a one-shot connection
    fn send_ephemeral<'a>(
        &'a self,
        event: &'a Event,
        relay_url: &'a RelayUrl,
    ) -> BoxedFuture<'a, Result<(), TransportError>>;

    /// Send a `REQ` for historical events
    ///
    /// The received events are expected to be handed back to the engine.
    fn fetch_history(&self, filters: Vec<Filter>) -> BoxedFuture<'_, Result<(), TransportError>>;

    /// Stream of relay `OK` acknowledgements
    fn acknowledgements(&self) -> broadcast::Receiver<RelayAck>;
}

#[doc(hidden)]
pub trait IntoRelayTransport {
    #[doc(hidden)]
    fn into_relay_transport(self) -> Arc<dyn RelayTransport>;
}

impl IntoRelayTransport for Arc<dyn RelayTransport> {
    fn into_relay_transport(self) -> Arc<dyn RelayTransport> {
        self
    }
}

impl<T> IntoRelayTransport for T
where
    T: RelayTransport + Sized + 'static,
{
    fn into_relay_transport(self) -> Arc<dyn RelayTransport> {
        Arc::new(self)
    }
}

impl<T> IntoRelayTransport for Arc<T>
where
    T: RelayTransport + 'static,
{
    fn into_relay_transport(self) -> Arc<dyn RelayTransport> {
        self
    }
}
