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

//! In-memory outbox store.
//!
//! Backs single-process hosts and every test in this crate. All operations
//! run under one mutex, which gives the per-operation atomicity the
//! contract requires for free.

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;
use uuid::Uuid;

use super::OutboxStore;
use crate::clock::{Clock, SystemClock};
use crate::error::StoreError;
use crate::models::command::{CommandFailure, CommandStatus, OutboxCommand};

use async_trait::async_trait;

struct Entry {
    // Insertion order; breaks created_at ties so FIFO stays deterministic.
    seq: u64,
    command: OutboxCommand,
}

#[derive(Default)]
struct State {
    entries: HashMap<Uuid, Entry>,
    next_seq: u64,
}

/// [`OutboxStore`] backed by a process-local map.
pub struct MemoryOutboxStore {
    state: Mutex<State>,
    clock: Arc<dyn Clock>,
}

impl MemoryOutboxStore {
    /// Creates an empty store reading time from the given clock.
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        Self {
            state: Mutex::new(State::default()),
            clock,
        }
    }

    fn with_command<T>(
        &self,
        command_id: Uuid,
        f: impl FnOnce(&mut OutboxCommand) -> Result<T, StoreError>,
    ) -> Result<T, StoreError> {
        let mut state = self.state.lock();
        let entry = state
            .entries
            .get_mut(&command_id)
            .ok_or(StoreError::NotFound(command_id))?;
        f(&mut entry.command)
    }
}

impl Default for MemoryOutboxStore {
    fn default() -> Self {
        Self::new(Arc::new(SystemClock))
    }
}

fn expect_status(
    command: &OutboxCommand,
    allowed: &[CommandStatus],
    to: CommandStatus,
) -> Result<(), StoreError> {
    if allowed.contains(&command.status) {
        Ok(())
    } else {
        Err(StoreError::InvalidTransition {
            command_id: command.id,
            from: command.status,
            to,
        })
    }
}

#[async_trait]
impl OutboxStore for MemoryOutboxStore {
    async fn enqueue(&self, command: OutboxCommand) -> Result<(), StoreError> {
        let mut state = self.state.lock();

        let duplicate = state.entries.values().any(|e| {
            e.command.workspace_id == command.workspace_id
                && e.command.idempotency_key == command.idempotency_key
        });
        if duplicate {
            return Err(StoreError::DuplicateIdempotencyKey {
                workspace_id: command.workspace_id,
                idempotency_key: command.idempotency_key,
            });
        }

        let seq = state.next_seq;
        state.next_seq += 1;
        state.entries.insert(command.id, Entry { seq, command });
        Ok(())
    }

    async fn list_pending(
        &self,
        workspace_id: &str,
        limit: usize,
    ) -> Result<Vec<OutboxCommand>, StoreError> {
        let now = self.clock.now();
        let state = self.state.lock();

        let mut eligible: Vec<&Entry> = state
            .entries
            .values()
            .filter(|e| {
                e.command.workspace_id == workspace_id
                    && e.command.status == CommandStatus::Pending
                    && e.command.next_attempt_at.map_or(true, |at| at <= now)
            })
            .collect();
        eligible.sort_by_key(|e| (e.command.created_at, e.seq));

        Ok(eligible
            .into_iter()
            .take(limit)
            .map(|e| e.command.clone())
            .collect())
    }

    async fn get_by_id(&self, command_id: Uuid) -> Result<Option<OutboxCommand>, StoreError> {
        let state = self.state.lock();
        Ok(state.entries.get(&command_id).map(|e| e.command.clone()))
    }

    async fn find_by_workspace(
        &self,
        workspace_id: &str,
    ) -> Result<Vec<OutboxCommand>, StoreError> {
        let state = self.state.lock();
        let mut entries: Vec<&Entry> = state
            .entries
            .values()
            .filter(|e| e.command.workspace_id == workspace_id)
            .collect();
        entries.sort_by_key(|e| (e.command.created_at, e.seq));
        Ok(entries.into_iter().map(|e| e.command.clone()).collect())
    }

    async fn mark_in_flight(&self, command_id: Uuid) -> Result<(), StoreError> {
        let now = self.clock.now();
        self.with_command(command_id, |command| {
            expect_status(command, &[CommandStatus::Pending], CommandStatus::InFlight)?;
            command.status = CommandStatus::InFlight;
            command.started_at = Some(now);
            Ok(())
        })
    }

    async fn mark_succeeded(
        &self,
        command_id: Uuid,
        meta: Option<Value>,
    ) -> Result<(), StoreError> {
        self.with_command(command_id, |command| {
            expect_status(command, &[CommandStatus::InFlight], CommandStatus::Succeeded)?;
            command.status = CommandStatus::Succeeded;
            command.next_attempt_at = None;
            command.started_at = None;
            command.meta = meta;
            command.error = None;
            Ok(())
        })
    }

    async fn mark_failed(
        &self,
        command_id: Uuid,
        error: CommandFailure,
    ) -> Result<(), StoreError> {
        self.with_command(command_id, |command| {
            expect_status(command, &[CommandStatus::InFlight], CommandStatus::Failed)?;
            command.status = CommandStatus::Failed;
            command.attempts += 1;
            command.next_attempt_at = None;
            command.started_at = None;
            command.error = Some(error);
            Ok(())
        })
    }

    async fn mark_conflict(
        &self,
        command_id: Uuid,
        info: Option<Value>,
    ) -> Result<(), StoreError> {
        self.with_command(command_id, |command| {
            expect_status(command, &[CommandStatus::InFlight], CommandStatus::Conflict)?;
            command.status = CommandStatus::Conflict;
            command.next_attempt_at = None;
            command.started_at = None;
            command.conflict = info;
            Ok(())
        })
    }

    async fn increment_attempt(
        &self,
        command_id: Uuid,
        next_attempt_at: DateTime<Utc>,
        error: CommandFailure,
    ) -> Result<(), StoreError> {
        self.with_command(command_id, |command| {
            expect_status(
                command,
                &[CommandStatus::InFlight, CommandStatus::Pending],
                CommandStatus::Pending,
            )?;
            command.status = CommandStatus::Pending;
            command.attempts += 1;
            command.next_attempt_at = Some(next_attempt_at);
            command.started_at = None;
            command.error = Some(error);
            Ok(())
        })
    }

    async fn reset_to_pending(&self, command_id: Uuid) -> Result<(), StoreError> {
        self.with_command(command_id, |command| {
            expect_status(
                command,
                &[
                    CommandStatus::Pending,
                    CommandStatus::Failed,
                    CommandStatus::Conflict,
                ],
                CommandStatus::Pending,
            )?;
            command.status = CommandStatus::Pending;
            command.next_attempt_at = None;
            command.started_at = None;
            command.error = None;
            Ok(())
        })
    }

    async fn clear_workspace(&self, workspace_id: &str) -> Result<u64, StoreError> {
        let mut state = self.state.lock();
        let before = state.entries.len();
        state
            .entries
            .retain(|_, e| e.command.workspace_id != workspace_id);
        Ok((before - state.entries.len()) as u64)
    }

    async fn sweep_stale_in_flight(
        &self,
        workspace_id: &str,
        cutoff: DateTime<Utc>,
    ) -> Result<u64, StoreError> {
        let mut state = self.state.lock();
        let mut recovered = 0;
        for entry in state.entries.values_mut() {
            let command = &mut entry.command;
            if command.workspace_id == workspace_id
                && command.status == CommandStatus::InFlight
                && command.started_at.map_or(false, |at| at < cutoff)
            {
                command.status = CommandStatus::Pending;
                command.started_at = None;
                recovered += 1;
            }
        }
        Ok(recovered)
    }
}
