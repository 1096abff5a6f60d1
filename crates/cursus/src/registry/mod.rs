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

//! # Command Registry
//!
//! Validates and normalizes command payloads before they are enqueued.
//! Each command type is registered exactly once at startup with a schema
//! check and an optional normalization hook; registering the same type
//! twice is a configuration bug and fails loudly.
//!
//! The registry is a pure construction-time helper: the engine never
//! re-validates payloads it pulls from the store.

use parking_lot::RwLock;
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use std::collections::HashMap;

use crate::error::RegistryError;

/// Schema check plus optional normalization for one command type.
///
/// Takes the raw payload and returns the canonical payload to persist, or
/// a description of why the payload is invalid.
type PayloadChecker = Box<dyn Fn(Value) -> Result<Value, String> + Send + Sync>;

struct CommandDefinition {
    check: PayloadChecker,
}

/// Registry of command definitions, keyed by command type.
///
/// Constructed once by the host application and shared (via `Arc`) with
/// whatever code builds commands.
#[derive(Default)]
pub struct CommandRegistry {
    definitions: RwLock<HashMap<String, CommandDefinition>>,
}

impl CommandRegistry {
    /// Creates an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a command type with a validation function.
    ///
    /// The validator inspects the raw payload and returns an error message
    /// on mismatch. Fails with [`RegistryError::DuplicateType`] if the type
    /// is already registered.
    pub fn register<V>(&self, command_type: impl Into<String>, validator: V) -> Result<(), RegistryError>
    where
        V: Fn(&Value) -> Result<(), String> + Send + Sync + 'static,
    {
        self.register_checker(
            command_type,
            Box::new(move |payload| {
                validator(&payload)?;
                Ok(payload)
            }),
        )
    }

    /// Registers a command type with a validation function and a
    /// normalization hook applied after validation passes.
    pub fn register_with_normalizer<V, N>(
        &self,
        command_type: impl Into<String>,
        validator: V,
        normalizer: N,
    ) -> Result<(), RegistryError>
    where
        V: Fn(&Value) -> Result<(), String> + Send + Sync + 'static,
        N: Fn(Value) -> Value + Send + Sync + 'static,
    {
        self.register_checker(
            command_type,
            Box::new(move |payload| {
                validator(&payload)?;
                Ok(normalizer(payload))
            }),
        )
    }

    /// Registers a command type whose schema is a serde type.
    ///
    /// The payload is deserialized into `T` (the schema check) and
    /// serialized back (the normalization), so unknown-field and shape
    /// errors surface with serde's diagnostics.
    pub fn register_as<T>(&self, command_type: impl Into<String>) -> Result<(), RegistryError>
    where
        T: DeserializeOwned + Serialize + 'static,
    {
        self.register_checker(
            command_type,
            Box::new(|payload| {
                let parsed: T = serde_json::from_value(payload).map_err(|e| e.to_string())?;
                serde_json::to_value(parsed).map_err(|e| e.to_string())
            }),
        )
    }

    fn register_checker(
        &self,
        command_type: impl Into<String>,
        check: PayloadChecker,
    ) -> Result<(), RegistryError> {
        let command_type = command_type.into();
        let mut definitions = self.definitions.write();
        if definitions.contains_key(&command_type) {
            return Err(RegistryError::DuplicateType(command_type));
        }
        tracing::debug!(command_type = %command_type, "Registered command definition");
        definitions.insert(command_type, CommandDefinition { check });
        Ok(())
    }

    /// Validates a raw payload against the registered schema for its type
    /// and returns the canonical payload to enqueue.
    pub fn validate(&self, command_type: &str, payload: Value) -> Result<Value, RegistryError> {
        let definitions = self.definitions.read();
        let definition = definitions
            .get(command_type)
            .ok_or_else(|| RegistryError::UnknownType(command_type.to_string()))?;

        (definition.check)(payload).map_err(|reason| RegistryError::InvalidPayload {
            command_type: command_type.to_string(),
            reason,
        })
    }

    /// Whether a definition exists for the given type.
    pub fn is_registered(&self, command_type: &str) -> bool {
        self.definitions.read().contains_key(command_type)
    }

    /// All registered command types.
    pub fn registered_types(&self) -> Vec<String> {
        self.definitions.read().keys().cloned().collect()
    }
}
