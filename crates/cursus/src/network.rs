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

//! Network connectivity monitor.
//!
//! The engine only asks two things of connectivity: a point-in-time read
//! that gates flushing, and a change feed so an offline-to-online
//! transition can trigger an immediate flush instead of waiting for the
//! next timer tick.

use tokio::sync::watch;

/// Point-in-time connectivity status.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NetworkStatus {
    /// The remote system is reachable.
    Online,
    /// Flushing would be pointless; commands stay queued.
    Offline,
}

/// Source of connectivity status and change notifications.
pub trait NetworkMonitor: Send + Sync {
    /// Current connectivity.
    fn current(&self) -> NetworkStatus;

    /// A receiver that observes status transitions in the order they
    /// happen.
    fn watch(&self) -> watch::Receiver<NetworkStatus>;
}

/// Monitor for hosts with no meaningful offline state (servers).
pub struct AlwaysOnline {
    sender: watch::Sender<NetworkStatus>,
}

impl AlwaysOnline {
    /// Creates the monitor.
    pub fn new() -> Self {
        let (sender, _) = watch::channel(NetworkStatus::Online);
        Self { sender }
    }
}

impl Default for AlwaysOnline {
    fn default() -> Self {
        Self::new()
    }
}

impl NetworkMonitor for AlwaysOnline {
    fn current(&self) -> NetworkStatus {
        NetworkStatus::Online
    }

    fn watch(&self) -> watch::Receiver<NetworkStatus> {
        self.sender.subscribe()
    }
}

/// Monitor driven by explicit status updates.
///
/// Hosts feed it transitions from whatever platform signal they have
/// (browser online events, OS reachability callbacks); tests flip it
/// directly.
pub struct ManualNetworkMonitor {
    sender: watch::Sender<NetworkStatus>,
}

impl ManualNetworkMonitor {
    /// Creates a monitor with the given initial status.
    pub fn new(initial: NetworkStatus) -> Self {
        let (sender, _) = watch::channel(initial);
        Self { sender }
    }

    /// Reports a status transition to all watchers.
    pub fn set(&self, status: NetworkStatus) {
        self.sender.send_replace(status);
    }
}

impl NetworkMonitor for ManualNetworkMonitor {
    fn current(&self) -> NetworkStatus {
        *self.sender.borrow()
    }

    fn watch(&self) -> watch::Receiver<NetworkStatus> {
        self.sender.subscribe()
    }
}
