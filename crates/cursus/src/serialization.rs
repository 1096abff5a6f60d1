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

//! Storage-safe command representation.
//!
//! Some storage backends only handle primitives and strings (key-value
//! stores, browser-indexed storage). [`StoredCommand`] is the flattened
//! form: ids and timestamps become RFC 3339 strings, statuses become their
//! string names, and structured fields become plain JSON. The mapping is
//! pure and lossless both ways so storage adapters can be unit-tested
//! without any engine wiring.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

use crate::error::SerializationError;
use crate::models::command::{CommandFailure, CommandStatus, OutboxCommand};

/// Flattened, storage-safe mirror of [`OutboxCommand`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StoredCommand {
    /// Command id as a UUID string
    pub id: String,
    /// Workspace scoping key
    pub workspace_id: String,
    /// Command type discriminator
    pub command_type: String,
    /// Opaque payload
    pub payload: Value,
    /// Creation time, RFC 3339
    pub created_at: String,
    /// Status name, see [`CommandStatus::as_str`]
    pub status: String,
    /// Delivery attempts so far
    pub attempts: u32,
    /// Earliest next attempt, RFC 3339
    pub next_attempt_at: Option<String>,
    /// Start of the current in-flight attempt, RFC 3339
    pub started_at: Option<String>,
    /// Duplicate-detection key
    pub idempotency_key: String,
    /// Optional trace id
    pub client_trace_id: Option<String>,
    /// Opaque success metadata
    pub meta: Option<Value>,
    /// Last failure, stored as plain JSON
    pub error: Option<Value>,
    /// Opaque conflict detail
    pub conflict: Option<Value>,
}

impl From<&OutboxCommand> for StoredCommand {
    fn from(command: &OutboxCommand) -> Self {
        Self {
            id: command.id.to_string(),
            workspace_id: command.workspace_id.clone(),
            command_type: command.command_type.clone(),
            payload: command.payload.clone(),
            created_at: command.created_at.to_rfc3339(),
            status: command.status.as_str().to_string(),
            attempts: command.attempts,
            next_attempt_at: command.next_attempt_at.map(|t| t.to_rfc3339()),
            started_at: command.started_at.map(|t| t.to_rfc3339()),
            idempotency_key: command.idempotency_key.clone(),
            client_trace_id: command.client_trace_id.clone(),
            meta: command.meta.clone(),
            // CommandFailure serializes infallibly: all fields are strings,
            // bools or JSON values.
            error: command
                .error
                .as_ref()
                .and_then(|e| serde_json::to_value(e).ok()),
            conflict: command.conflict.clone(),
        }
    }
}

impl TryFrom<StoredCommand> for OutboxCommand {
    type Error = SerializationError;

    fn try_from(stored: StoredCommand) -> Result<Self, Self::Error> {
        let id = Uuid::parse_str(&stored.id)
            .map_err(|_| SerializationError::InvalidId(stored.id.clone()))?;
        let status = CommandStatus::parse(&stored.status)
            .ok_or_else(|| SerializationError::UnknownStatus(stored.status.clone()))?;
        let created_at = parse_timestamp("createdAt", &stored.created_at)?;
        let next_attempt_at = stored
            .next_attempt_at
            .as_deref()
            .map(|v| parse_timestamp("nextAttemptAt", v))
            .transpose()?;
        let started_at = stored
            .started_at
            .as_deref()
            .map(|v| parse_timestamp("startedAt", v))
            .transpose()?;
        let error: Option<CommandFailure> = stored
            .error
            .map(serde_json::from_value)
            .transpose()
            .map_err(SerializationError::MalformedError)?;

        Ok(OutboxCommand {
            id,
            workspace_id: stored.workspace_id,
            command_type: stored.command_type,
            payload: stored.payload,
            created_at,
            status,
            attempts: stored.attempts,
            next_attempt_at,
            started_at,
            idempotency_key: stored.idempotency_key,
            client_trace_id: stored.client_trace_id,
            meta: stored.meta,
            error,
            conflict: stored.conflict,
        })
    }
}

fn parse_timestamp(
    field: &'static str,
    value: &str,
) -> Result<DateTime<Utc>, SerializationError> {
    DateTime::parse_from_rfc3339(value)
        .map(|t| t.with_timezone(&Utc))
        .map_err(|_| SerializationError::InvalidTimestamp {
            field,
            value: value.to_string(),
        })
}
