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

//! Error types for the cursus crate.
//!
//! Each subsystem has its own error enum so that callers can match on the
//! failures they actually care about. Adapter-specific failures are carried
//! as opaque strings in the `Backend` variants: the engine never interprets
//! backend detail, it only decides whether a cycle can continue.

use thiserror::Error;
use uuid::Uuid;

use crate::models::command::CommandStatus;

/// Errors raised by the command registry.
#[derive(Debug, Error)]
pub enum RegistryError {
    /// A definition for this command type already exists. Registration
    /// happens once at startup, so this is a configuration bug and is
    /// surfaced instead of being silently overwritten.
    #[error("command type '{0}' is already registered")]
    DuplicateType(String),

    /// No definition is registered for the requested command type.
    #[error("unknown command type '{0}'")]
    UnknownType(String),

    /// The payload did not match the registered schema for its type.
    #[error("invalid payload for command type '{command_type}': {reason}")]
    InvalidPayload {
        /// The command type whose schema rejected the payload
        command_type: String,
        /// Human-readable description of the mismatch
        reason: String,
    },
}

/// Errors raised by outbox store implementations.
#[derive(Debug, Error)]
pub enum StoreError {
    /// No command with this id exists in the store.
    #[error("command {0} not found")]
    NotFound(Uuid),

    /// A command with the same `(workspace_id, idempotency_key)` pair is
    /// already queued. The caller is re-enqueueing an operation it has
    /// already constructed.
    #[error("idempotency key '{idempotency_key}' already queued for workspace '{workspace_id}'")]
    DuplicateIdempotencyKey {
        /// Workspace the duplicate was enqueued for
        workspace_id: String,
        /// The offending idempotency key
        idempotency_key: String,
    },

    /// The requested status change is not allowed by the command state
    /// machine (e.g. marking a succeeded command in-flight).
    #[error("command {command_id}: illegal transition {from} -> {to}")]
    InvalidTransition {
        /// The command being transitioned
        command_id: Uuid,
        /// Status the command is currently in
        from: CommandStatus,
        /// Status the caller asked for
        to: CommandStatus,
    },

    /// The underlying storage backend failed.
    #[error("store backend error: {0}")]
    Backend(String),
}

/// Errors raised by sync lock implementations.
#[derive(Debug, Error)]
pub enum LockError {
    /// The underlying lock backend failed.
    #[error("lock backend error: {0}")]
    Backend(String),
}

/// Errors raised by sync transport implementations.
///
/// An `Err` from the transport means the call itself blew up before a
/// structured outcome could be produced; the engine treats it like a
/// transient failure and reschedules the command.
#[derive(Debug, Error)]
pub enum TransportError {
    /// The remote system could not be reached.
    #[error("transport network error: {0}")]
    Network(String),

    /// The transport failed internally (serialization, local cache, ...).
    #[error("transport internal error: {0}")]
    Internal(String),
}

/// Errors raised by one explicit flush cycle.
///
/// The background scheduler catches and logs these; they only propagate to
/// callers of [`SyncEngine::flush`](crate::engine::SyncEngine::flush).
#[derive(Debug, Error)]
pub enum FlushError {
    /// The outbox store failed mid-cycle.
    #[error(transparent)]
    Store(#[from] StoreError),

    /// The sync lock backend failed.
    #[error(transparent)]
    Lock(#[from] LockError),
}

/// Errors raised when decoding a stored command back into its rich form.
#[derive(Debug, Error)]
pub enum SerializationError {
    /// The stored command id is not a valid UUID.
    #[error("stored command has invalid id '{0}'")]
    InvalidId(String),

    /// A stored timestamp is not valid RFC 3339.
    #[error("stored command field '{field}' has invalid timestamp '{value}'")]
    InvalidTimestamp {
        /// Which timestamp field failed to parse
        field: &'static str,
        /// The raw stored value
        value: String,
    },

    /// The stored status string is not a known command status.
    #[error("stored command has unknown status '{0}'")]
    UnknownStatus(String),

    /// The stored error payload could not be decoded.
    #[error("stored command has malformed error payload: {0}")]
    MalformedError(#[source] serde_json::Error),
}
