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

//! Engine status events.
//!
//! Events are deliberately thin: subscribers get enough to know *what*
//! changed and re-query the store for detail. The store is the source of
//! truth; events are a responsiveness optimization and may be missed by
//! subscribers that attach late.

use serde::Serialize;
use uuid::Uuid;

use super::command::CommandStatus;

/// A notification emitted by the sync engine.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type")]
pub enum SyncEvent {
    /// One or more commands in the workspace changed during a flush cycle.
    #[serde(rename = "statusChanged", rename_all = "camelCase")]
    StatusChanged {
        /// Workspace whose queue changed
        workspace_id: String,
    },

    /// A single command transitioned to a new status.
    #[serde(rename = "commandUpdated", rename_all = "camelCase")]
    CommandUpdated {
        /// Workspace the command belongs to
        workspace_id: String,
        /// The command that changed
        command_id: Uuid,
        /// Status it transitioned to
        status: CommandStatus,
    },
}
