//
// Copyright 2025-2026 Hans W. Uhlig. All Rights Reserved.
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//      http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.
//
//! Error types for the AI engine
//!
//! Runtime decision failures (no target, no usable skill, unreachable
//! destination) are never errors: the engine falls back to a default status
//! or skips the tick. These types cover the cases that callers need to hear
//! about, chiefly bad configuration while preparing an entity.

use crate::ecs::components::{EntityId, Point};
use thiserror::Error;

/// Errors raised while preparing or directly commanding an AI entity
#[derive(Debug, Error)]
pub enum AiError {
    /// The entity id does not resolve in the zone.
    #[error("Entity not found: {0}")]
    EntityNotFound(EntityId),

    /// The entity is missing a component the AI engine needs.
    #[error("Entity {0} is missing component {1}")]
    MissingComponent(EntityId, &'static str),

    /// The entity has not been prepared for AI control.
    #[error("Entity {0} has no AI state")]
    NotPrepared(EntityId),

    /// No behavior definition with this id was configured.
    #[error("Unknown behavior: {0}")]
    UnknownBehavior(String),

    /// A behavior refers to a logic group that was not configured.
    #[error("Unknown logic group: {0}")]
    UnknownLogicGroup(String),

    /// The behavior's prepare hook did not complete.
    #[error("Prepare hook {hook} failed for entity {entity}")]
    PrepareHookFailed { entity: EntityId, hook: String },

    /// The entity is rooted, knocked back or dead.
    #[error("Entity {0} cannot move")]
    CannotMove(EntityId),

    /// The zone geometry offers no route.
    #[error("No path from {from:?} to {to:?}")]
    NoPath { from: Point, to: Point },

    /// Entity id bookkeeping failed.
    #[error("Registry error: {0}")]
    Registry(String),

    /// The ECS world rejected a component access.
    #[error("Component error: {0}")]
    Component(#[from] hecs::ComponentError),

    /// The ECS entity no longer exists.
    #[error("No such entity: {0}")]
    NoSuchEntity(#[from] hecs::NoSuchEntity),
}

/// Errors reported by an ability service
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AbilityError {
    /// The service could not take the request right now; try again later.
    #[error("Ability service is busy")]
    Busy,

    /// The request can never succeed as made.
    #[error("Invalid ability use: {0}")]
    Invalid(String),
}

impl AbilityError {
    /// Failure may go away if the command is retried
    pub fn is_transient(&self) -> bool {
        matches!(self, AbilityError::Busy)
    }
}

/// Errors raised while loading configuration
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The configuration file could not be opened.
    #[error("Failed to open config file: {0}")]
    Io(#[from] std::io::Error),

    /// The configuration file is not valid YAML for this schema.
    #[error("Failed to parse config file: {0}")]
    Parse(#[from] serde_yaml::Error),

    /// Cross references inside the configuration do not line up.
    #[error("Invalid configuration: {0}")]
    Invalid(String),
}
