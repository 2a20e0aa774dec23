// Copyright (c) 2022-2023 Yuki Kishimoto
// Copyright (c) 2023-2025 Rust Nostr Developers
// Distributed under the MIT software license

//! Engine options

use std::num::NonZeroUsize;
use std::time::Duration;

use crate::constant::{
    DEFAULT_DEDUP_CAPACITY, DEFAULT_DELIVERY_TIMEOUT, DEFAULT_NOTIFICATION_CHANNEL_SIZE,
    DEFAULT_RELAY_LOOKUP_TIMEOUT, DEFAULT_RESCAN_GRACE, DEFAULT_RESCAN_INTERVAL,
    DEFAULT_RESCAN_MONTHS,
};

/// Engine options
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DmOptions {
    pub(crate) delivery_timeout: Duration,
    pub(crate) relay_lookup_timeout: Duration,
    pub(crate) dedup_capacity: NonZeroUsize,
    pub(crate) undo_window: Option<Duration>,
    pub(crate) rescan_months: u32,
    pub(crate) rescan_grace: Duration,
    pub(crate) rescan_interval: Duration,
    pub(crate) notification_channel_size: usize,
}

impl Default for DmOptions {
    fn default() -> Self {
        Self {
            delivery_timeout: DEFAULT_DELIVERY_TIMEOUT,
            relay_lookup_timeout: DEFAULT_RELAY_LOOKUP_TIMEOUT,
            dedup_capacity: DEFAULT_DEDUP_CAPACITY,
            undo_window: None,
            rescan_months: DEFAULT_RESCAN_MONTHS,
            rescan_grace: DEFAULT_RESCAN_GRACE,
            rescan_interval: DEFAULT_RESCAN_INTERVAL,
            notification_channel_size: DEFAULT_NOTIFICATION_CHANNEL_SIZE,
        }
    }
}

impl DmOptions {
    /// Create new default options
    #[inline]
    pub fn new() -> Self {
        Self::default()
    }

    /// Timeout for relay `OK` acknowledgements (default: 4 secs)
    ///
    /// When it expires, every relay still sending for a recipient is marked as timed out.
    #[inline]
    pub fn delivery_timeout(mut self, timeout: Duration) -> Self {
        self.delivery_timeout = timeout;
        self
    }

    /// Timeout for DM relay lookups during protocol version resolution (default: 10 secs)
    #[inline]
    pub fn relay_lookup_timeout(mut self, timeout: Duration) -> Self {
        self.relay_lookup_timeout = timeout;
        self
    }

    /// Capacity of the recently sent message IDs set (default: 10)
    ///
    /// Relay echoes of messages still in this set are discarded.
    #[inline]
    pub fn dedup_capacity(mut self, capacity: NonZeroUsize) -> Self {
        self.dedup_capacity = capacity;
        self
    }

    /// Delay the publishing of outbound messages, to allow to undo the send (default: None)
    #[inline]
    pub fn undo_window(mut self, window: Option<Duration>) -> Self {
        self.undo_window = window;
        self
    }

    /// Number of 30-day windows requested by a rescan (default: 36)
    #[inline]
    pub fn rescan_months(mut self, months: u32) -> Self {
        self.rescan_months = months;
        self
    }

    /// Grace delay before starting a rescan (default: 5 secs)
    #[inline]
    pub fn rescan_grace(mut self, grace: Duration) -> Self {
        self.rescan_grace = grace;
        self
    }

    /// Delay between two rescan windows (default: 5 secs)
    #[inline]
    pub fn rescan_interval(mut self, interval: Duration) -> Self {
        self.rescan_interval = interval;
        self
    }

    /// Notification channel size (default: 4096)
    ///
    /// Values below 1 are raised to 1.
    #[inline]
    pub fn notification_channel_size(mut self, size: usize) -> Self {
        self.notification_channel_size = size.max(1);
        self
    }
}
