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

//! Event type definitions

use crate::ecs::components::{EntityId, Motion, Point};
use serde::{Deserialize, Serialize};

/// Movement change of a single entity, relayed to every observer in range
///
/// Observers interpolate between origin and destination themselves, so a
/// notification is only produced on the tick a motion starts.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum MovementNotification {
    Move {
        entity: EntityId,
        origin: Point,
        destination: Point,
        origin_ticks: u64,
        destination_ticks: u64,
    },
    Rotate {
        entity: EntityId,
        rotation: f32,
        origin_ticks: u64,
        destination_ticks: u64,
    },
    Stop {
        entity: EntityId,
        position: Point,
        ticks: u64,
    },
}

impl MovementNotification {
    /// Describe what observers need to know about a motion at `now`
    ///
    /// A motion that started this tick is reported as a move or a turn;
    /// anything else is reported as the entity standing still.
    pub fn from_motion(entity: EntityId, motion: &Motion, now: u64) -> Self {
        if now == motion.origin_ticks {
            if motion.destination != motion.origin {
                return MovementNotification::Move {
                    entity,
                    origin: motion.origin,
                    destination: motion.destination,
                    origin_ticks: motion.origin_ticks,
                    destination_ticks: motion.destination_ticks,
                };
            }
            if motion.destination_rotation != motion.origin_rotation {
                return MovementNotification::Rotate {
                    entity,
                    rotation: motion.destination_rotation,
                    origin_ticks: motion.origin_ticks,
                    destination_ticks: motion.destination_ticks,
                };
            }
        }

        MovementNotification::Stop {
            entity,
            position: motion.current,
            ticks: now,
        }
    }

    pub fn entity(&self) -> EntityId {
        match self {
            MovementNotification::Move { entity, .. }
            | MovementNotification::Rotate { entity, .. }
            | MovementNotification::Stop { entity, .. } => *entity,
        }
    }
}

/// All events produced by AI controlled entities
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum GameEvent {
    /// Position or facing changed in a way observers must be told about
    Movement(MovementNotification),

    /// Entity was instantly relocated
    EntityWarped {
        entity: EntityId,
        position: Point,
        rotation: f32,
    },

    /// A hostile entity picked a new target
    TargetAcquired {
        entity: EntityId,
        target: EntityId,
    },

    /// An entity lost its target and returned to its default behavior
    TargetLost {
        entity: EntityId,
    },

    /// Entity will be removed at the end of the tick
    DespawnMarked {
        entity: EntityId,
    },

    /// A scripted command finished
    ScriptCompleted {
        entity: EntityId,
        hook: String,
    },
}

impl GameEvent {
    /// Entity the event is about
    pub fn entity(&self) -> EntityId {
        match self {
            GameEvent::Movement(notification) => notification.entity(),
            GameEvent::EntityWarped { entity, .. }
            | GameEvent::TargetAcquired { entity, .. }
            | GameEvent::TargetLost { entity }
            | GameEvent::DespawnMarked { entity }
            | GameEvent::ScriptCompleted { entity, .. } => *entity,
        }
    }

    /// Whether `other` is the subject of this event or its new target
    pub fn involves(&self, other: EntityId) -> bool {
        match self {
            GameEvent::TargetAcquired { entity, target } => *entity == other || *target == other,
            event => event.entity() == other,
        }
    }

    pub fn kind(&self) -> EventKind {
        match self {
            GameEvent::Movement(_) => EventKind::Movement,
            GameEvent::EntityWarped { .. } => EventKind::Warp,
            GameEvent::TargetAcquired { .. } | GameEvent::TargetLost { .. } => EventKind::Targeting,
            GameEvent::DespawnMarked { .. } => EventKind::Despawn,
            GameEvent::ScriptCompleted { .. } => EventKind::Script,
        }
    }
}

/// Coarse grouping of [`GameEvent`]s used to filter subscriptions
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EventKind {
    Movement,
    Warp,
    Targeting,
    Despawn,
    Script,
}

impl From<MovementNotification> for GameEvent {
    fn from(notification: MovementNotification) -> Self {
        GameEvent::Movement(notification)
    }
}
