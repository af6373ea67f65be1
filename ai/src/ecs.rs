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
//! Entity Component System (ECS) module
//!
//! Each zone owns its own hecs world. AI controlled entities carry an
//! [`components::AiState`] alongside their motion and combat components,
//! and the systems in [`systems`] advance them tick by tick.

pub use hecs::{Entity, World};

/// Type alias for hecs runtime entity handles
///
/// These are internal to a zone's world. Everything outside the zone refers
/// to entities by [`components::EntityId`].
pub type EcsEntity = Entity;

/// Type alias for the game world
pub type GameWorld = World;

pub mod abilities;
pub mod actor_builder;
pub mod components;
pub mod context;
pub mod events;
pub mod geometry;
pub mod hooks;
pub mod registry;
pub mod systems;
pub mod zone;

pub use actor_builder::ActorBuilder;
pub use registry::EntityRegistry;
pub use zone::Zone;

#[cfg(test)]
pub mod test_utils;
