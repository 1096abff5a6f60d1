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

//! # Cursus
//!
//! A library for durable offline command queuing and replay.
//!
//! Clients that must keep working without connectivity (point-of-sale
//! devices, browser tabs) queue locally-originated mutations as commands
//! in a durable outbox. Once connectivity returns, the [`SyncEngine`]
//! replays them against the remote system: in order per workspace, with
//! capped exponential backoff on transient failures, duplicate-safe via
//! per-command idempotency keys, and with conflicts surfaced for manual
//! resolution rather than auto-resolved.
//!
//! ## Architecture
//!
//! The engine is wired from narrow trait contracts, injected at
//! construction:
//!
//! - [`OutboxStore`]: the durable command queue (embedded SQL, browser
//!   storage, server database, or the bundled [`MemoryOutboxStore`])
//! - [`SyncLock`]: TTL-leased mutual exclusion so only one flusher runs
//!   per workspace across tabs/processes/devices
//! - [`SyncTransport`]: executes one command remotely and classifies the
//!   result (applied / retryable / fatal / conflict)
//! - [`NetworkMonitor`]: gates flushing on connectivity
//! - [`Clock`]: injectable time, so retry windows and lease expiry are
//!   testable
//!
//! ## Example
//!
//! ```rust,ignore
//! use cursus::{
//!     CommandRegistry, MemoryOutboxStore, MemorySyncLock, NewOutboxCommand,
//!     OutboxCommand, SyncEngine, SyncEngineConfig, SystemClock,
//! };
//! use std::sync::Arc;
//!
//! let clock = Arc::new(SystemClock);
//! let store = Arc::new(MemoryOutboxStore::new(clock.clone()));
//! let engine = SyncEngine::new(
//!     store.clone(),
//!     Arc::new(MemorySyncLock::new(clock.clone())),
//!     transport,          // your SyncTransport implementation
//!     network,            // your NetworkMonitor implementation
//!     clock.clone(),
//!     SyncEngineConfig::default(),
//! );
//!
//! // Queue a command (works offline) and let the engine deliver it.
//! let registry = CommandRegistry::new();
//! registry.register_as::<SalePayload>("sale.create")?;
//! let payload = registry.validate("sale.create", raw_payload)?;
//! store.enqueue(OutboxCommand::from_new(
//!     NewOutboxCommand {
//!         workspace_id: "shop-1".into(),
//!         command_type: "sale.create".into(),
//!         payload,
//!         idempotency_key: "sale-7f3a".into(),
//!         client_trace_id: None,
//!     },
//!     clock.now(),
//! )).await?;
//!
//! engine.track_workspace("shop-1");
//! engine.start();
//! ```

pub mod clock;
pub mod engine;
pub mod error;
pub mod lock;
pub mod models;
pub mod network;
pub mod registry;
pub mod retry;
pub mod serialization;
pub mod store;
pub mod transport;

pub use clock::{Clock, ManualClock, SystemClock};
pub use engine::{FlushOutcome, FlushStats, SyncEngine, SyncEngineConfig, SyncEngineConfigBuilder};
pub use error::{
    FlushError, LockError, RegistryError, SerializationError, StoreError, TransportError,
};
pub use lock::{MemorySyncLock, SyncLock, DEFAULT_LEASE_TTL};
pub use models::command::{
    CommandFailure, CommandStatus, NewOutboxCommand, OutboxCommand,
};
pub use models::event::SyncEvent;
pub use network::{AlwaysOnline, ManualNetworkMonitor, NetworkMonitor, NetworkStatus};
pub use registry::CommandRegistry;
pub use retry::{compute_backoff_delay, BackoffPolicy};
pub use serialization::StoredCommand;
pub use store::{MemoryOutboxStore, OutboxStore};
pub use transport::{CommandOutcome, SyncTransport};
