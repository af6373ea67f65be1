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

//! Entity Registry for mapping between zone entity ids and ECS handles
//!
//! This module provides bidirectional mapping between:
//! - `EcsEntity`: hecs runtime entity handles
//! - `EntityId`: zone local integer identifiers shared with clients and
//!   stored in every cross-entity reference
//!
//! Ids are kept in order so that every tick visits entities in the same
//! sequence regardless of hash seeds.

use crate::ecs::EcsEntity;
use crate::ecs::components::EntityId;
use std::collections::{BTreeMap, HashMap};

/// Registry for mapping between zone entity ids and ECS entities
#[derive(Debug, Default)]
pub struct EntityRegistry {
    /// Map from EntityId to ECS entity handle
    id_to_entity: BTreeMap<EntityId, EcsEntity>,

    /// Map from ECS entity handle to EntityId
    entity_to_id: HashMap<EcsEntity, EntityId>,
}

impl EntityRegistry {
    /// Create a new empty registry
    pub fn new() -> Self {
        Self {
            id_to_entity: BTreeMap::new(),
            entity_to_id: HashMap::new(),
        }
    }

    /// Register a mapping between an ECS entity and its id
    ///
    /// # Returns
    /// * `Ok(())` if registration succeeded
    /// * `Err(String)` if either the entity or id is already registered
    pub fn register(&mut self, entity: EcsEntity, id: EntityId) -> Result<(), String> {
        if self.entity_to_id.contains_key(&entity) {
            return Err(format!("Entity {:?} is already registered", entity));
        }
        if self.id_to_entity.contains_key(&id) {
            return Err(format!("Entity id {} is already registered", id));
        }

        self.id_to_entity.insert(id, entity);
        self.entity_to_id.insert(entity, id);

        Ok(())
    }

    /// Unregister an entity by its ECS handle
    pub fn unregister_entity(&mut self, entity: EcsEntity) -> Option<EntityId> {
        let id = self.entity_to_id.remove(&entity)?;
        self.id_to_entity.remove(&id);
        Some(id)
    }

    /// Unregister an entity by its id
    pub fn unregister_id(&mut self, id: EntityId) -> Option<EcsEntity> {
        let entity = self.id_to_entity.remove(&id)?;
        self.entity_to_id.remove(&entity);
        Some(entity)
    }

    /// Look up an ECS entity by its id
    pub fn get_entity(&self, id: EntityId) -> Option<EcsEntity> {
        self.id_to_entity.get(&id).copied()
    }

    /// Look up an id by its ECS entity
    pub fn get_id(&self, entity: EcsEntity) -> Option<EntityId> {
        self.entity_to_id.get(&entity).copied()
    }

    pub fn contains_id(&self, id: EntityId) -> bool {
        self.id_to_entity.contains_key(&id)
    }

    /// Get the number of registered entities
    pub fn len(&self) -> usize {
        self.id_to_entity.len()
    }

    pub fn is_empty(&self) -> bool {
        self.id_to_entity.is_empty()
    }

    /// Get all registered ids in ascending order
    pub fn ids(&self) -> impl Iterator<Item = EntityId> + '_ {
        self.id_to_entity.keys().copied()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ecs::GameWorld;

    #[test]
    fn test_register_and_lookup() {
        let mut registry = EntityRegistry::new();
        let mut world = GameWorld::new();

        let entity = world.spawn(());
        let id = EntityId(7);

        assert!(registry.register(entity, id).is_ok());
        assert_eq!(registry.get_entity(id), Some(entity));
        assert_eq!(registry.get_id(entity), Some(id));
    }

    #[test]
    fn test_duplicate_registration() {
        let mut registry = EntityRegistry::new();
        let mut world = GameWorld::new();

        let entity = world.spawn(());
        assert!(registry.register(entity, EntityId(1)).is_ok());

        // Duplicate entity registration fails
        assert!(registry.register(entity, EntityId(2)).is_err());

        // Duplicate id registration fails
        let entity2 = world.spawn(());
        assert!(registry.register(entity2, EntityId(1)).is_err());
    }

    #[test]
    fn test_unregister() {
        let mut registry = EntityRegistry::new();
        let mut world = GameWorld::new();

        let entity = world.spawn(());
        registry.register(entity, EntityId(3)).unwrap();

        assert_eq!(registry.unregister_entity(entity), Some(EntityId(3)));
        assert_eq!(registry.get_entity(EntityId(3)), None);

        registry.register(entity, EntityId(3)).unwrap();
        assert_eq!(registry.unregister_id(EntityId(3)), Some(entity));
        assert_eq!(registry.get_id(entity), None);
        assert!(registry.is_empty());
    }

    #[test]
    fn test_ids_are_ordered() {
        let mut registry = EntityRegistry::new();
        let mut world = GameWorld::new();

        for raw in [5, 1, 3] {
            let entity = world.spawn(());
            registry.register(entity, EntityId(raw)).unwrap();
        }

        let ids: Vec<EntityId> = registry.ids().collect();
        assert_eq!(ids, vec![EntityId(1), EntityId(3), EntityId(5)]);
    }
}
