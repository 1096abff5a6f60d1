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

//! Outbox command model.
//!
//! An [`OutboxCommand`] is the unit of durable work: a locally-originated
//! mutation waiting to be replayed against the remote system. Commands move
//! through a small state machine:
//!
//! ```text
//! PENDING ----(dequeued)----> IN_FLIGHT
//! IN_FLIGHT --(applied)-----> SUCCEEDED   (terminal)
//! IN_FLIGHT --(retryable)---> PENDING     (next_attempt_at = now + backoff)
//! IN_FLIGHT --(fatal)-------> FAILED      (terminal)
//! IN_FLIGHT --(conflict)----> CONFLICT    (terminal until operator reset)
//! ```
//!
//! `FAILED` and `CONFLICT` commands only leave their state through an
//! explicit operator reset back to `PENDING`.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

/// Lifecycle status of an outbox command.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CommandStatus {
    /// Queued and eligible for delivery once `next_attempt_at` passes.
    Pending,
    /// Handed to the transport; a crash here leaves a visibly-stuck record
    /// for the staleness sweep rather than a silently lost attempt.
    InFlight,
    /// Accepted and applied by the remote system. Terminal.
    Succeeded,
    /// Permanently rejected. Terminal until an operator resets it.
    Failed,
    /// The remote system reported a state conflict. Terminal until an
    /// operator resolves it; never retried automatically.
    Conflict,
}

impl CommandStatus {
    /// String form used at the storage boundary.
    pub fn as_str(&self) -> &'static str {
        match self {
            CommandStatus::Pending => "Pending",
            CommandStatus::InFlight => "InFlight",
            CommandStatus::Succeeded => "Succeeded",
            CommandStatus::Failed => "Failed",
            CommandStatus::Conflict => "Conflict",
        }
    }

    /// Parses the storage string form.
    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "Pending" => Some(CommandStatus::Pending),
            "InFlight" => Some(CommandStatus::InFlight),
            "Succeeded" => Some(CommandStatus::Succeeded),
            "Failed" => Some(CommandStatus::Failed),
            "Conflict" => Some(CommandStatus::Conflict),
            _ => None,
        }
    }

    /// Whether the status is terminal for unattended processing.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            CommandStatus::Succeeded | CommandStatus::Failed | CommandStatus::Conflict
        )
    }
}

impl std::fmt::Display for CommandStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The recorded outcome of a failed delivery attempt.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CommandFailure {
    /// Human-readable description of the failure
    pub message: String,
    /// Optional machine-readable code from the remote system
    pub code: Option<String>,
    /// Whether the failure is transient and worth retrying
    pub retryable: bool,
    /// Opaque extra detail supplied by the transport
    pub meta: Option<Value>,
}

impl CommandFailure {
    /// A transient failure the engine should retry with backoff.
    pub fn retryable(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            code: None,
            retryable: true,
            meta: None,
        }
    }

    /// A permanent failure that should stop delivery attempts.
    pub fn fatal(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            code: None,
            retryable: false,
            meta: None,
        }
    }

    /// Attaches a machine-readable code.
    pub fn with_code(mut self, code: impl Into<String>) -> Self {
        self.code = Some(code.into());
        self
    }
}

/// Input for constructing a new command.
///
/// The caller supplies everything that identifies the logical operation;
/// [`OutboxCommand::from_new`] fills in the generated id, timestamps and
/// initial state.
#[derive(Debug, Clone)]
pub struct NewOutboxCommand {
    /// Workspace the command belongs to
    pub workspace_id: String,
    /// Registered command type discriminator
    pub command_type: String,
    /// Type-specific payload, already validated by the registry
    pub payload: Value,
    /// Stable key for server-side duplicate detection. Retries of the same
    /// logical operation must reuse this key, never mint a new one.
    pub idempotency_key: String,
    /// Optional trace id correlating retries in logs
    pub client_trace_id: Option<String>,
}

/// A durable, replayable command queued in the outbox.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OutboxCommand {
    /// Unique id, generated client-side at enqueue time
    pub id: Uuid,
    /// Workspace scoping key; every store query is scoped by this
    pub workspace_id: String,
    /// Registered command type discriminator
    pub command_type: String,
    /// Opaque type-specific payload
    pub payload: Value,
    /// Client-side creation time; delivery order within a workspace
    pub created_at: DateTime<Utc>,
    /// Current lifecycle status
    pub status: CommandStatus,
    /// Number of delivery attempts so far
    pub attempts: u32,
    /// Earliest time the next attempt may run; `None` means eligible now
    pub next_attempt_at: Option<DateTime<Utc>>,
    /// When the current in-flight attempt started, if any
    pub started_at: Option<DateTime<Utc>>,
    /// Stable duplicate-detection key, unique per workspace
    pub idempotency_key: String,
    /// Optional trace id correlating retries in logs
    pub client_trace_id: Option<String>,
    /// Opaque success metadata returned by the transport
    pub meta: Option<Value>,
    /// Last delivery failure, if any
    pub error: Option<CommandFailure>,
    /// Opaque conflict detail surfaced for manual resolution
    pub conflict: Option<Value>,
}

impl OutboxCommand {
    /// Builds a freshly-enqueued command in `Pending` state.
    ///
    /// The id is generated here, client-side, so the command is fully
    /// formed before it ever touches a store; enqueueing must work while
    /// offline.
    pub fn from_new(new: NewOutboxCommand, now: DateTime<Utc>) -> Self {
        Self {
            id: Uuid::new_v4(),
            workspace_id: new.workspace_id,
            command_type: new.command_type,
            payload: new.payload,
            created_at: now,
            status: CommandStatus::Pending,
            attempts: 0,
            next_attempt_at: None,
            started_at: None,
            idempotency_key: new.idempotency_key,
            client_trace_id: new.client_trace_id,
            meta: None,
            error: None,
            conflict: None,
        }
    }

    /// Whether this command has reached a terminal status.
    pub fn is_terminal(&self) -> bool {
        self.status.is_terminal()
    }
}
