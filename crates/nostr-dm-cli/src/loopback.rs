// Copyright (c) 2022-2023 Yuki Kishimoto
// Copyright (c) 2023-2025 Rust Nostr Developers
// Distributed under the MIT software license

//! In-process relay transport

use std::collections::HashSet;
use std::sync::{Mutex, PoisonError};

use nostr::util::BoxedFuture;
use nostr::{Event, Filter, RelayUrl};
use nostr_dm::transport::{RelayAck, RelayTransport, TransportError};
use tokio::sync::broadcast;

/// Transport that "publishes" by storing the events in memory and acknowledging them right away
#[derive(Debug)]
pub struct LoopbackTransport {
    connected: HashSet<RelayUrl>,
    silent: HashSet<RelayUrl>,
    published: Mutex<Vec<(Event, RelayUrl, bool)>>,
    acks: broadcast::Sender<RelayAck>,
}

impl LoopbackTransport {
    pub fn new<I, S>(connected: I, silent: S) -> Self
    where
        I: IntoIterator<Item = RelayUrl>,
        S: IntoIterator<Item = RelayUrl>,
    {
        let (acks, ..) = broadcast::channel(1024);

        Self {
            connected: connected.into_iter().collect(),
            silent: silent.into_iter().collect(),
            published: Mutex::new(Vec::new()),
            acks,
        }
    }

    /// Published events, with the relay and whether a one-shot connection was used
    pub fn published(&self) -> Vec<(Event, RelayUrl, bool)> {
        self.published
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    fn publish(&self, event: &Event, relay_url: &RelayUrl, ephemeral: bool) {
        self.published
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push((event.clone(), relay_url.clone(), ephemeral));

        if self.silent.contains(relay_url) {
            tracing::debug!(id = %event.id, relay = %relay_url, "Silent relay, no OK.");
            return;
        }

        let _ = self
            .acks
            .send(RelayAck::accepted(event.id, relay_url.clone()));
    }
}

impl RelayTransport for LoopbackTransport {
    fn is_connected<'a>(&'a self, relay_url: &'a RelayUrl) -> BoxedFuture<'a, bool> {
        Box::pin(async move { self.connected.contains(relay_url) })
    }

    fn send<'a>(
        &'a self,
        event: &'a Event,
        relays: &'a HashSet<RelayUrl>,
    ) -> BoxedFuture<'a, Result<(), TransportError>> {
        Box::pin(async move {
            for relay_url in relays.iter() {
                if !self.connected.contains(relay_url) {
                    return Err(TransportError::Unreachable(relay_url.clone()));
                }

                self.publish(event, relay_url, false);
            }

            Ok(())
        })
    }

    fn send_ephemeral<'a>(
        &'a self,
        event: &'a Event,
        relay_url: &'a RelayUrl,
    ) -> BoxedFuture<'a, Result<(), TransportError>> {
        Box::pin(async move {
            self.publish(event, relay_url, true);
            Ok(())
        })
    }

    fn fetch_history(&self, _filters: Vec<Filter>) -> BoxedFuture<'_, Result<(), TransportError>> {
        Box::pin(async move { Ok(()) })
    }

    fn acknowledgements(&self) -> broadcast::Receiver<RelayAck> {
        self.acks.subscribe()
    }
}
