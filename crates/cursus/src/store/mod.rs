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

//! Outbox store contract.
//!
//! The store is the durable command queue. Concrete backends (embedded
//! SQL, browser-indexed storage, a server-side database, the in-memory
//! adapter in [`memory`]) implement [`OutboxStore`]; the engine only ever
//! talks to the trait.
//!
//! Every operation must be atomic with respect to concurrent readers: a
//! `list_pending` call never observes a command mid-transition. No
//! cross-command transactionality is required.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde_json::Value;
use uuid::Uuid;

use crate::error::StoreError;
use crate::models::command::{CommandFailure, OutboxCommand};

mod memory;

pub use memory::MemoryOutboxStore;

/// Durable queue of outbox commands.
#[async_trait]
pub trait OutboxStore: Send + Sync {
    /// Persists a new command in `Pending` status.
    ///
    /// Must be safe to call while offline. Fails with
    /// [`StoreError::DuplicateIdempotencyKey`] if the workspace already
    /// queues a command with the same idempotency key.
    async fn enqueue(&self, command: OutboxCommand) -> Result<(), StoreError>;

    /// Returns up to `limit` `Pending` commands whose `next_attempt_at` is
    /// unset or has passed, oldest `created_at` first, scoped to the
    /// workspace.
    async fn list_pending(
        &self,
        workspace_id: &str,
        limit: usize,
    ) -> Result<Vec<OutboxCommand>, StoreError>;

    /// Looks up a single command by id.
    async fn get_by_id(&self, command_id: Uuid) -> Result<Option<OutboxCommand>, StoreError>;

    /// Returns every command in the workspace regardless of status,
    /// oldest first. Status counts and per-command error detail for UIs
    /// derive from this; the event channel is never the source of truth.
    async fn find_by_workspace(
        &self,
        workspace_id: &str,
    ) -> Result<Vec<OutboxCommand>, StoreError>;

    /// Transitions `Pending -> InFlight` and records the attempt start
    /// time. Called before the transport is invoked so a crash mid-call
    /// leaves a visible in-flight record instead of a lost attempt.
    async fn mark_in_flight(&self, command_id: Uuid) -> Result<(), StoreError>;

    /// Transitions `InFlight -> Succeeded`, clears `next_attempt_at` and
    /// stores the transport's success metadata. Terminal.
    async fn mark_succeeded(
        &self,
        command_id: Uuid,
        meta: Option<Value>,
    ) -> Result<(), StoreError>;

    /// Transitions `InFlight -> Failed`, increments `attempts` and stores
    /// the error. Terminal until an operator resets the command.
    async fn mark_failed(
        &self,
        command_id: Uuid,
        error: CommandFailure,
    ) -> Result<(), StoreError>;

    /// Transitions `InFlight -> Conflict`, clears `next_attempt_at` and
    /// stores the conflict detail. Does not touch `attempts`.
    async fn mark_conflict(
        &self,
        command_id: Uuid,
        info: Option<Value>,
    ) -> Result<(), StoreError>;

    /// Reschedules a command after a transient failure: back to `Pending`,
    /// `attempts` incremented, `next_attempt_at` set to the given time and
    /// the failure recorded for operators to inspect.
    async fn increment_attempt(
        &self,
        command_id: Uuid,
        next_attempt_at: DateTime<Utc>,
        error: CommandFailure,
    ) -> Result<(), StoreError>;

    /// Manual recovery: sets the command back to `Pending`, clearing
    /// `next_attempt_at` and the recorded error while leaving `attempts`
    /// untouched. Allowed from `Pending`, `Failed` and `Conflict`.
    async fn reset_to_pending(&self, command_id: Uuid) -> Result<(), StoreError>;

    /// Deletes every command in the workspace (e.g. on logout). Returns
    /// the number of commands removed.
    async fn clear_workspace(&self, workspace_id: &str) -> Result<u64, StoreError>;

    /// Crash recovery: atomically resets `InFlight` commands whose attempt
    /// started before `cutoff` back to `Pending`, keeping `attempts`.
    /// Returns the number of commands recovered. The engine runs this
    /// under the workspace sync lock at the start of each cycle.
    async fn sweep_stale_in_flight(
        &self,
        workspace_id: &str,
        cutoff: DateTime<Utc>,
    ) -> Result<u64, StoreError>;
}
