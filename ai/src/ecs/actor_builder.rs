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
//! Builder for actors placed into a zone
//!
//! Collects everything the AI engine needs to know about an actor before it
//! is spawned, so that a zone never holds a half-built entity.

use crate::ecs::components::{Combatant, EntityKind, Motion, Name, Point, SpawnOrigin};

/// Description of an actor waiting to be spawned into a zone
#[derive(Debug, Clone)]
pub struct ActorBuilder {
    /// Display name
    pub name: Name,

    /// What sort of actor this is
    pub kind: EntityKind,

    /// Starting position
    pub position: Point,

    /// Starting facing in radians
    pub rotation: f32,

    /// Movement speed in units per second
    pub run_speed: f32,

    /// Fighting state
    pub combatant: Combatant,

    /// Spawn and home regions, for AI controlled actors
    pub origin: Option<SpawnOrigin>,
}

impl ActorBuilder {
    /// Create a builder for a full health actor at the zone origin
    pub fn new(name: impl Into<String>, kind: EntityKind) -> Self {
        Self {
            name: Name::new(name),
            kind,
            position: Point::default(),
            rotation: 0.0,
            run_speed: 300.0,
            combatant: Combatant::new(0, 100, 0),
            origin: None,
        }
    }

    pub fn at(mut self, position: Point) -> Self {
        self.position = position;
        self
    }

    pub fn facing(mut self, rotation: f32) -> Self {
        self.rotation = rotation;
        self
    }

    pub fn with_speed(mut self, run_speed: f32) -> Self {
        self.run_speed = run_speed;
        self
    }

    pub fn with_combatant(mut self, combatant: Combatant) -> Self {
        self.combatant = combatant;
        self
    }

    pub fn with_origin(mut self, origin: SpawnOrigin) -> Self {
        self.origin = Some(origin);
        self
    }

    /// Motion state the actor starts with
    pub fn motion(&self) -> Motion {
        Motion::new(self.position, self.rotation, self.run_speed)
    }
}
