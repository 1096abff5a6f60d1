/*
 *  Copyright 2025-2026 Colliery Software
 *
 *  Licensed under the Apache License, Version 2.0 (the "License");
 *  you may not use this file except in compliance with the License.
 *  You may obtain a copy of the License at
 *
 *      http://www.apache.org/licenses/LICENSE-2.0
 *
 *  Unless required by applicable law or agreed to in writing, software
 *  distributed under the License is distributed on an "AS IS" BASIS,
 *  WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
 *  See the License for the specific language governing permissions and
 *  limitations under the License.
 */

//! Configuration for the sync engine.
//!
//! # Construction
//!
//! Use [`SyncEngineConfig::builder()`] to override defaults:
//!
//! ```rust,ignore
//! let config = SyncEngineConfig::builder()
//!     .flush_interval(Duration::from_secs(10))
//!     .batch_size(50)
//!     .build();
//! ```

use std::time::Duration;

use crate::retry::BackoffPolicy;

/// Configuration parameters controlling engine behavior.
#[derive(Debug, Clone)]
#[non_exhaustive]
pub struct SyncEngineConfig {
    flush_interval: Duration,
    batch_size: usize,
    backoff: BackoffPolicy,
    stale_in_flight_after: Option<Duration>,
    event_capacity: usize,
}

impl SyncEngineConfig {
    /// Creates a configuration builder with default values.
    pub fn builder() -> SyncEngineConfigBuilder {
        SyncEngineConfigBuilder::default()
    }

    /// How often the background loop flushes tracked workspaces.
    pub fn flush_interval(&self) -> Duration {
        self.flush_interval
    }

    /// Maximum commands pulled from the store per workspace per cycle.
    pub fn batch_size(&self) -> usize {
        self.batch_size
    }

    /// Backoff policy applied to retryable failures.
    pub fn backoff(&self) -> &BackoffPolicy {
        &self.backoff
    }

    /// Age past which an in-flight command is considered orphaned by a
    /// crashed flusher and swept back to pending. `None` disables the
    /// sweep.
    pub fn stale_in_flight_after(&self) -> Option<Duration> {
        self.stale_in_flight_after
    }

    /// Capacity of the status event channel. Slow subscribers that fall
    /// more than this many events behind observe a lag error and should
    /// re-read the store.
    pub fn event_capacity(&self) -> usize {
        self.event_capacity
    }
}

impl Default for SyncEngineConfig {
    fn default() -> Self {
        SyncEngineConfigBuilder::default().build()
    }
}

/// Builder for [`SyncEngineConfig`].
#[derive(Debug, Clone)]
pub struct SyncEngineConfigBuilder {
    flush_interval: Duration,
    batch_size: usize,
    backoff: BackoffPolicy,
    stale_in_flight_after: Option<Duration>,
    event_capacity: usize,
}

impl Default for SyncEngineConfigBuilder {
    fn default() -> Self {
        Self {
            flush_interval: Duration::from_secs(30),
            batch_size: 20,
            backoff: BackoffPolicy::default(),
            stale_in_flight_after: Some(Duration::from_secs(300)),
            event_capacity: 64,
        }
    }
}

impl SyncEngineConfigBuilder {
    /// Sets the background flush interval.
    pub fn flush_interval(mut self, interval: Duration) -> Self {
        self.flush_interval = interval;
        self
    }

    /// Sets the per-cycle batch size.
    pub fn batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size;
        self
    }

    /// Sets the retry backoff policy.
    pub fn backoff(mut self, backoff: BackoffPolicy) -> Self {
        self.backoff = backoff;
        self
    }

    /// Sets the stale in-flight threshold, or disables the sweep with
    /// `None`.
    pub fn stale_in_flight_after(mut self, threshold: Option<Duration>) -> Self {
        self.stale_in_flight_after = threshold;
        self
    }

    /// Sets the status event channel capacity.
    pub fn event_capacity(mut self, capacity: usize) -> Self {
        self.event_capacity = capacity;
        self
    }

    /// Builds the configuration.
    pub fn build(self) -> SyncEngineConfig {
        SyncEngineConfig {
            flush_interval: self.flush_interval,
            batch_size: self.batch_size,
            backoff: self.backoff,
            stale_in_flight_after: self.stale_in_flight_after,
            event_capacity: self.event_capacity,
        }
    }
}
