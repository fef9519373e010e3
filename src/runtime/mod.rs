// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Controller runtime plumbing: watch streams, the single-key sync loop, and
//! retry backoff.

pub mod error_policy;
pub mod watch_loop;

pub use watch_loop::{run_sync_loop, spawn_watchers};
