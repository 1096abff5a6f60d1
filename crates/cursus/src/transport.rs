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

//! Sync transport contract.
//!
//! The transport is the only component that knows the wire: endpoint
//! routing, auth, and how the backend's error shapes map onto the four
//! structured outcomes below. The engine never inspects transport-specific
//! detail.
//!
//! Implementations own their network timeout and must resolve rather than
//! hang: a stalled call stalls that workspace's cycle until the lock lease
//! expires and another flusher takes over.
//!
//! The transport is expected to send the command's `idempotency_key` so
//! the remote system can detect a redelivered command and treat it as
//! already applied.

use async_trait::async_trait;
use serde_json::Value;

use crate::error::TransportError;
use crate::models::command::{CommandFailure, OutboxCommand};

/// Structured result of executing one command remotely.
#[derive(Debug, Clone, PartialEq)]
pub enum CommandOutcome {
    /// The remote system accepted and applied the command. `meta` carries
    /// opaque success detail (server-assigned ids etc.).
    Applied {
        /// Opaque success metadata to persist on the command
        meta: Option<Value>,
    },

    /// Transient failure (5xx, timeout); the engine reschedules with
    /// backoff.
    Retryable(CommandFailure),

    /// Permanent rejection (validation failure, unknown command type on
    /// the server); delivery stops until an operator intervenes.
    Fatal(CommandFailure),

    /// The remote system detected a state conflict (e.g. a concurrent
    /// edit). Routed to a human; never retried automatically.
    Conflict {
        /// Opaque conflict detail to persist on the command
        info: Value,
    },
}

/// Executes commands against the remote system.
#[async_trait]
pub trait SyncTransport: Send + Sync {
    /// Sends one command and reports the structured outcome.
    ///
    /// Returning `Err` means the call itself failed before an outcome
    /// could be determined; the engine treats that exactly like a
    /// [`CommandOutcome::Retryable`] failure.
    async fn execute(&self, command: &OutboxCommand) -> Result<CommandOutcome, TransportError>;
}
