// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Retry backoff for failed syncs.
//!
//! A sync that fails is retried with exponential backoff until it succeeds or
//! a new watch event arrives; either resets the schedule. Transient API
//! failures and permanent spec errors share this policy, because a permanent
//! error re-reported every minute is harmless while a transient one must
//! keep retrying.

use std::time::Duration;

use crate::constants::{SYNC_RETRY_INITIAL_MILLIS, SYNC_RETRY_MAX_SECS, SYNC_RETRY_MULTIPLIER};

/// Exponential backoff schedule for one run of consecutive sync failures.
#[derive(Debug)]
pub struct SyncBackoff {
    next: Duration,
}

impl SyncBackoff {
    /// Start a fresh schedule.
    #[must_use]
    pub fn new() -> Self {
        Self {
            next: Duration::from_millis(SYNC_RETRY_INITIAL_MILLIS),
        }
    }

    /// The delay before the next retry; each call grows the following one.
    pub fn next_delay(&mut self) -> Duration {
        let delay = self.next;
        let grown = delay.as_secs_f64() * SYNC_RETRY_MULTIPLIER;
        self.next = Duration::from_secs_f64(grown).min(Duration::from_secs(SYNC_RETRY_MAX_SECS));
        delay
    }
}

impl Default for SyncBackoff {
    fn default() -> Self {
        Self::new()
    }
}
