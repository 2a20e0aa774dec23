// Copyright (c) 2022-2023 Yuki Kishimoto
// Copyright (c) 2023-2025 Rust Nostr Developers
// Distributed under the MIT software license

use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_utility::{task, time};
use nostr::EventId;
use tokio::sync::broadcast::{self, error::RecvError};

use super::{lock, DmEngine, DmNotification};
use crate::delivery::{DeliveryKey, DeliveryLedger, DeliveryUpdate, SendJob};
use crate::tracker::CorrelationTracker;
use crate::transport::RelayAck;

fn notify_update(notifications: &broadcast::Sender<DmNotification>, update: DeliveryUpdate) {
    let _ = notifications.send(DmNotification::DeliveryUpdated {
        message_id: update.message_id,
        conversation: update.conversation,
        result: update.result,
    });
}

impl DmEngine {
    /// Register a correlation entry for every relay of the job and schedule its timeout
    pub(super) fn track_job(&self, job: &SendJob) {
        let wire_id: EventId = job.wire_id();
        let timeout: Duration = self.inner.opts.delivery_timeout;

        for relay_url in job.relays.iter() {
            let key: DeliveryKey = DeliveryKey::new(wire_id, relay_url.clone());

            let ledger: Arc<Mutex<DeliveryLedger>> = self.inner.ledger.clone();
            let notifications = self.inner.notifications.clone();
            let on_match = move |ack: RelayAck| {
                let update: Option<DeliveryUpdate> =
                    lock(&ledger).mark_success(&DeliveryKey::new(ack.event_id, ack.relay_url));
                if let Some(update) = update {
                    notify_update(&notifications, update);
                }
            };

            let ledger: Arc<Mutex<DeliveryLedger>> = self.inner.ledger.clone();
            let notifications = self.inner.notifications.clone();
            let on_timeout = move || {
                let update: Option<DeliveryUpdate> = lock(&ledger).mark_timeout(&wire_id);
                if let Some(update) = update {
                    tracing::debug!(id = %wire_id, recipient = %update.result.recipient, "Delivery timed out.");
                    notify_update(&notifications, update);
                }
            };

            if !self
                .inner
                .tracker
                .register(key, timeout, on_match, on_timeout)
            {
                tracing::trace!(id = %wire_id, relay = %relay_url, "Delivery already tracked.");
            }
        }

        let tracker: Arc<CorrelationTracker<DeliveryKey, RelayAck>> = self.inner.tracker.clone();
        task::spawn(async move {
            time::sleep(timeout).await;
            tracker.tick();
        });
    }

    /// Handle a relay `OK`
    ///
    /// Gift wrap acks resolve the delivery of their recipient, the others are treated as
    /// legacy messages and only recorded on the message.
    pub async fn handle_ack(&self, ack: RelayAck) {
        if !ack.success {
            tracing::warn!(
                id = %ack.event_id,
                relay = %ack.relay_url,
                reason = ack.message.as_deref().unwrap_or_default(),
                "Event rejected by relay."
            );
            return;
        }

        let owner: Option<(EventId, bool)> = lock(&self.inner.ledger).wrap_owner(&ack.event_id);

        match owner {
            Some((message_id, is_self)) => {
                let key: DeliveryKey = DeliveryKey::new(ack.event_id, ack.relay_url.clone());
                let relay_url = ack.relay_url.clone();

                if self.inner.tracker.resolve(&key, ack) && is_self {
                    // The self copy landed: the rumor is retrievable from this relay
                    if let Err(e) = self.seen_on(&message_id, Some(&relay_url)).await {
                        tracing::error!(id = %message_id, error = %e, "Impossible to update message relays.");
                    }
                }
            }
            None => {
                if let Err(e) = self.seen_on(&ack.event_id, Some(&ack.relay_url)).await {
                    tracing::error!(id = %ack.event_id, error = %e, "Impossible to update message relays.");
                }
            }
        }
    }

    /// Spawn a task consuming the transport acknowledgements
    ///
    /// Runs until the transport stream is closed.
    pub fn spawn_ack_listener(&self) {
        let engine: DmEngine = self.clone();
        let mut acks = self.inner.transport.acknowledgements();

        task::spawn(async move {
            loop {
                match acks.recv().await {
                    Ok(ack) => engine.handle_ack(ack).await,
                    Err(RecvError::Lagged(skipped)) => {
                        tracing::warn!(skipped, "Acknowledgements receiver lagged.");
                    }
                    Err(RecvError::Closed) => break,
                }
            }

            tracing::debug!("Acknowledgements listener exited.");
        });
    }
}
