// Copyright (c) 2022-2023 Yuki Kishimoto
// Copyright (c) 2023-2025 Rust Nostr Developers
// Distributed under the MIT software license

use std::sync::atomic::{AtomicBool, Ordering};

use async_utility::time;
use nostr::{PublicKey, Timestamp};

use super::{DmEngine, DmNotification};
use crate::classifier::{ConversationBuckets, ConversationClassifier};
use crate::error::Error;
use crate::rescan::{self, RescanWindow};

/// Clears the rescan flag when dropped
struct RescanGuard<'a> {
    flag: &'a AtomicBool,
}

impl<'a> RescanGuard<'a> {
    /// Returns `None` if a rescan is already running
    fn acquire(flag: &'a AtomicBool) -> Option<Self> {
        flag.compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| Self { flag })
    }
}

impl Drop for RescanGuard<'_> {
    fn drop(&mut self) {
        self.flag.store(false, Ordering::Release);
    }
}

impl DmEngine {
    /// Request the direct message history, one 30-day window at a time, most recent first
    ///
    /// The received events must be passed to [`DmEngine::handle_event`].
    /// Returns `false` if another rescan is already running.
    pub async fn rescan(&self) -> bool {
        let Some(_guard) = RescanGuard::acquire(&self.inner.rescanning) else {
            tracing::debug!("Rescan already running.");
            return false;
        };

        let account: PublicKey = self.public_key();
        let windows: Vec<RescanWindow> =
            rescan::rescan_windows(Timestamp::now(), self.inner.opts.rescan_months);
        let total: u32 = windows.len() as u32;

        tracing::info!(windows = total, "Starting rescan.");

        for (index, window) in windows.into_iter().enumerate() {
            if index > 0 {
                time::sleep(self.inner.opts.rescan_interval).await;
            }

            tracing::debug!(months_ago = window.months_ago, since = %window.since, until = %window.until, "Requesting history.");

            if let Err(e) = self
                .inner
                .transport
                .fetch_history(window.filters(account))
                .await
            {
                tracing::warn!(months_ago = window.months_ago, error = %e, "Impossible to request history.");
            }

            self.notify(DmNotification::RescanProgress {
                months_ago: window.months_ago,
                total,
            });
        }

        tracing::info!("Rescan completed.");

        true
    }

    /// Rescan if there are no accepted conversations and no requests
    ///
    /// Waits for the grace delay and checks again before starting, giving the live
    /// subscription a chance to deliver something.
    /// Returns `true` if a rescan has been run.
    pub async fn rescan_if_empty(&self, classifier: &ConversationClassifier) -> Result<bool, Error> {
        if !self.is_empty(classifier).await? {
            return Ok(false);
        }

        time::sleep(self.inner.opts.rescan_grace).await;

        if !self.is_empty(classifier).await? {
            return Ok(false);
        }

        Ok(self.rescan().await)
    }

    async fn is_empty(&self, classifier: &ConversationClassifier) -> Result<bool, Error> {
        let buckets: ConversationBuckets = self.classify(classifier).await?;
        Ok(buckets.is_empty())
    }
}
