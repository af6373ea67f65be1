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
//! Zone: one independently simulated partition of the world
//!
//! A zone owns the hecs world holding its actors, the registry that maps
//! zone entity ids to ECS handles, the geometry used for line of sight and
//! path finding, and the set of actors waiting to be despawned. Every
//! lookup the AI engine performs on another actor goes through the zone by
//! id, and every write to another actor's bookkeeping (pursuers, opponents)
//! goes through a zone method.

use crate::ecs::actor_builder::ActorBuilder;
use crate::ecs::components::{
    AiState, Combatant, EntityId, EntityKind, Line, Motion, Point, Pursuers, SpawnOrigin,
    SpawnRegion, normalize_angle,
};
use crate::ecs::events::{EventBus, GameEvent};
use crate::ecs::geometry::{Geometry, OpenGeometry};
use crate::ecs::registry::EntityRegistry;
use crate::ecs::{EcsEntity, GameWorld};
use crate::error::AiError;
use crate::random::RandomSource;
use hecs::{Component, Ref, RefMut};
use std::collections::{BTreeSet, HashSet};
use std::f32::consts::PI;

/// Attempts made to find a random point inside a polygon before settling
/// for its center
const REGION_SAMPLE_ATTEMPTS: usize = 32;

/// One simulated zone instance
pub struct Zone {
    id: u32,
    name: String,
    world: GameWorld,
    registry: EntityRegistry,
    geometry: Box<dyn Geometry>,
    pending_despawns: BTreeSet<EntityId>,
    next_entity_id: i32,
    event_bus: EventBus,
}

impl Zone {
    /// Create an empty zone with no obstacles
    pub fn new(id: u32, name: impl Into<String>) -> Self {
        Self {
            id,
            name: name.into(),
            world: GameWorld::new(),
            registry: EntityRegistry::new(),
            geometry: Box::new(OpenGeometry),
            pending_despawns: BTreeSet::new(),
            next_entity_id: 1,
            event_bus: EventBus::new(),
        }
    }

    pub fn with_geometry(mut self, geometry: impl Geometry + 'static) -> Self {
        self.geometry = Box::new(geometry);
        self
    }

    /// Share an event bus with the rest of the server
    pub fn with_event_bus(mut self, event_bus: EventBus) -> Self {
        self.event_bus = event_bus;
        self
    }

    pub fn id(&self) -> u32 {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn event_bus(&self) -> &EventBus {
        &self.event_bus
    }

    pub fn world(&self) -> &GameWorld {
        &self.world
    }

    pub fn world_mut(&mut self) -> &mut GameWorld {
        &mut self.world
    }

    pub fn registry(&self) -> &EntityRegistry {
        &self.registry
    }

    pub fn len(&self) -> usize {
        self.registry.len()
    }

    pub fn is_empty(&self) -> bool {
        self.registry.is_empty()
    }

    // ============================================================================
    // Entity lifecycle
    // ============================================================================

    /// Spawn an actor, assigning it the next free entity id
    pub fn spawn(&mut self, actor: ActorBuilder) -> Result<EntityId, AiError> {
        while self.registry.contains_id(EntityId(self.next_entity_id)) {
            self.next_entity_id += 1;
        }
        let id = EntityId(self.next_entity_id);
        self.next_entity_id += 1;
        self.spawn_with_id(id, actor)
    }

    /// Spawn an actor under a caller chosen entity id
    pub fn spawn_with_id(&mut self, id: EntityId, actor: ActorBuilder) -> Result<EntityId, AiError> {
        if self.registry.contains_id(id) {
            return Err(AiError::Registry(format!("Entity id {} is already registered", id)));
        }

        let motion = actor.motion();
        let entity = self.world.spawn((
            id,
            actor.name,
            actor.kind,
            motion,
            actor.combatant,
            Pursuers::new(),
        ));
        if let Some(origin) = actor.origin {
            self.world.insert_one(entity, origin)?;
        }
        self.registry.register(entity, id).map_err(AiError::Registry)?;

        tracing::trace!("Zone {} spawned {} as {:?}", self.id, id, entity);
        Ok(id)
    }

    /// ECS handle for a registered entity
    pub fn entity(&self, id: EntityId) -> Option<EcsEntity> {
        self.registry.get_entity(id)
    }

    pub fn contains(&self, id: EntityId) -> bool {
        self.registry.contains_id(id)
    }

    /// ECS handle for an entity that can currently be interacted with
    ///
    /// Entities pending despawn or not yet ready resolve to `None`.
    pub fn active_entity(&self, id: EntityId) -> Option<EcsEntity> {
        if self.pending_despawns.contains(&id) {
            return None;
        }
        let entity = self.registry.get_entity(id)?;
        let ready = self
            .world
            .get::<&Combatant>(entity)
            .map(|c| c.ready)
            .unwrap_or(false);
        ready.then_some(entity)
    }

    /// Queue an entity for removal at the end of the tick
    ///
    /// Returns false if the entity is unknown or already queued.
    pub fn mark_for_despawn(&mut self, id: EntityId) -> bool {
        if !self.registry.contains_id(id) || !self.pending_despawns.insert(id) {
            return false;
        }
        tracing::debug!("Zone {} marked {} for despawn", self.id, id);
        self.event_bus.publish(GameEvent::DespawnMarked { entity: id });
        true
    }

    pub fn is_pending_despawn(&self, id: EntityId) -> bool {
        self.pending_despawns.contains(&id)
    }

    /// Remove every entity marked for despawn
    ///
    /// Ids of removed entities are scrubbed from every remaining pursuer
    /// and opponent set so no stale reference survives the removal.
    pub fn flush_despawns(&mut self) -> Vec<EntityId> {
        let removed: Vec<EntityId> = std::mem::take(&mut self.pending_despawns)
            .into_iter()
            .filter(|id| {
                let Some(entity) = self.registry.unregister_id(*id) else {
                    return false;
                };
                self.world.despawn(entity).is_ok()
            })
            .collect();

        if removed.is_empty() {
            return removed;
        }

        for pursuers in self.world.query_mut::<&mut Pursuers>() {
            for id in &removed {
                pursuers.ids.remove(id);
            }
        }
        for combatant in self.world.query_mut::<&mut Combatant>() {
            for id in &removed {
                combatant.opponents.remove(id);
            }
        }

        tracing::debug!("Zone {} despawned {} entities", self.id, removed.len());
        removed
    }

    // ============================================================================
    // Component access
    // ============================================================================

    /// Borrow a component of an entity
    pub fn get<T: Component>(&self, id: EntityId) -> Option<Ref<'_, T>> {
        let entity = self.registry.get_entity(id)?;
        self.world.get::<&T>(entity).ok()
    }

    /// Mutably borrow a component of an entity
    pub fn get_mut<T: Component>(&self, id: EntityId) -> Option<RefMut<'_, T>> {
        let entity = self.registry.get_entity(id)?;
        self.world.get::<&mut T>(entity).ok()
    }

    pub fn kind(&self, id: EntityId) -> Option<EntityKind> {
        self.get::<EntityKind>(id).map(|kind| *kind)
    }

    /// Current position of an entity
    pub fn position(&self, id: EntityId) -> Option<Point> {
        self.get::<Motion>(id).map(|motion| motion.current)
    }

    /// Snapshot of an entity's motion state
    pub fn motion(&self, id: EntityId) -> Option<Motion> {
        self.get::<Motion>(id).map(|motion| (*motion).clone())
    }

    /// Snapshot of an entity's combat state
    pub fn combatant(&self, id: EntityId) -> Option<Combatant> {
        self.get::<Combatant>(id).map(|combatant| (*combatant).clone())
    }

    pub fn spawn_origin(&self, id: EntityId) -> Option<SpawnOrigin> {
        self.get::<SpawnOrigin>(id).map(|origin| (*origin).clone())
    }

    pub fn is_alive(&self, id: EntityId) -> bool {
        self.get::<Combatant>(id).is_some_and(|c| c.is_alive())
    }

    pub fn faction_group(&self, id: EntityId) -> Option<i32> {
        self.get::<Combatant>(id).map(|c| c.faction_group)
    }

    /// Detach an entity's AI state for exclusive processing
    pub fn take_ai(&mut self, id: EntityId) -> Option<AiState> {
        let entity = self.registry.get_entity(id)?;
        self.world.remove_one::<AiState>(entity).ok()
    }

    /// Reattach an AI state taken with `take_ai`
    ///
    /// Returns false if the entity despawned in the meantime.
    pub fn restore_ai(&mut self, id: EntityId, ai: AiState) -> bool {
        match self.registry.get_entity(id) {
            Some(entity) => self.world.insert_one(entity, ai).is_ok(),
            None => false,
        }
    }

    pub fn has_ai(&self, id: EntityId) -> bool {
        self.get::<AiState>(id).is_some()
    }

    /// Ids of every AI controlled entity, in id order
    pub fn ai_entity_ids(&self) -> Vec<EntityId> {
        let mut ids: Vec<EntityId> = self
            .world
            .query::<(&EntityId, &AiState)>()
            .iter()
            .map(|(id, _)| *id)
            .collect();
        ids.sort();
        ids
    }

    // ============================================================================
    // Aggro bookkeeping
    // ============================================================================

    /// Record that `pursuer` is targeting `target`
    pub fn add_pursuer(&mut self, target: EntityId, pursuer: EntityId) -> bool {
        self.get_mut::<Pursuers>(target)
            .is_some_and(|mut pursuers| pursuers.ids.insert(pursuer))
    }

    /// Record that `pursuer` stopped targeting `target`
    pub fn remove_pursuer(&mut self, target: EntityId, pursuer: EntityId) -> bool {
        self.get_mut::<Pursuers>(target)
            .is_some_and(|mut pursuers| pursuers.ids.remove(&pursuer))
    }

    /// Snapshot of everything pursuing an entity
    pub fn pursuers(&self, id: EntityId) -> HashSet<EntityId> {
        self.get::<Pursuers>(id)
            .map(|pursuers| pursuers.ids.clone())
            .unwrap_or_default()
    }

    /// Drop pursuers that are gone or no longer targeting `id`
    pub fn prune_pursuers(&mut self, id: EntityId) {
        let stale: Vec<EntityId> = self
            .pursuers(id)
            .into_iter()
            .filter(|pursuer| {
                if self.active_entity(*pursuer).is_none() {
                    return true;
                }
                // A pursuer being processed right now has its AI state
                // detached and is kept
                self.get::<AiState>(*pursuer)
                    .is_some_and(|ai| ai.target() != Some(id))
            })
            .collect();

        for pursuer in stale {
            self.remove_pursuer(id, pursuer);
        }
    }

    /// Record an exchange of hits between two entities
    pub fn add_opponents(&mut self, a: EntityId, b: EntityId) {
        if let Some(mut combatant) = self.get_mut::<Combatant>(a) {
            combatant.add_opponent(b);
        }
        if let Some(mut combatant) = self.get_mut::<Combatant>(b) {
            combatant.add_opponent(a);
        }
    }

    // ============================================================================
    // Spatial queries
    // ============================================================================

    /// Entities within `radius` of `position`, in id order
    pub fn entities_in_radius(&self, position: Point, radius: f32) -> Vec<EntityId> {
        let mut ids: Vec<EntityId> = self
            .world
            .query::<(&EntityId, &Motion)>()
            .iter()
            .filter(|(id, motion)| {
                !self.pending_despawns.contains(id) && motion.current.distance(position) <= radius
            })
            .map(|(id, _)| *id)
            .collect();
        ids.sort();
        ids
    }

    /// Subset of `ids` inside a view cone
    ///
    /// `half_angle` is measured either side of `rotation`; a half angle of
    /// PI or more sees all around.
    pub fn entities_in_fov(
        &self,
        ids: &[EntityId],
        position: Point,
        rotation: f32,
        half_angle: f32,
    ) -> Vec<EntityId> {
        if half_angle >= PI {
            return ids.to_vec();
        }

        ids.iter()
            .copied()
            .filter(|id| {
                self.position(*id).is_some_and(|p| {
                    p == position
                        || normalize_angle(position.angle_to(p) - rotation).abs() <= half_angle
                })
            })
            .collect()
    }

    /// Check whether something blocks a straight line
    pub fn has_line_of_sight_collision(&self, line: &Line) -> bool {
        self.geometry.collides(line).is_some()
    }

    /// First blocked point along a line
    pub fn collision(&self, line: &Line) -> Option<Point> {
        self.geometry.collides(line)
    }

    pub fn shortest_path(&self, from: Point, to: Point) -> Option<Vec<Point>> {
        self.geometry.shortest_path(from, to)
    }

    /// Uniformly random point inside a region
    pub fn random_point_in_region(&self, region: &SpawnRegion, rng: &mut dyn RandomSource) -> Point {
        let (min, max) = region.bounds();
        for _ in 0..REGION_SAMPLE_ATTEMPTS {
            let point = Point::new(
                min.x + (max.x - min.x) * rng.unit(),
                min.y + (max.y - min.y) * rng.unit(),
            );
            if region.contains(point) {
                return point;
            }
        }
        region.center()
    }
}

impl std::fmt::Debug for Zone {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Zone")
            .field("id", &self.id)
            .field("name", &self.name)
            .field("entities", &self.registry.len())
            .field("pending_despawns", &self.pending_despawns)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ecs::components::LogicGroup;
    use crate::random::seeded;
    use std::sync::Arc;

    fn actor(name: &str, x: f32, y: f32) -> ActorBuilder {
        ActorBuilder::new(name, EntityKind::Enemy).at(Point::new(x, y))
    }

    #[test]
    fn test_spawn_assigns_ids() {
        let mut zone = Zone::new(1, "Test");
        let a = zone.spawn(actor("A", 0.0, 0.0)).unwrap();
        let b = zone.spawn(actor("B", 0.0, 0.0)).unwrap();

        assert_ne!(a, b);
        assert_eq!(zone.len(), 2);
        assert!(zone.active_entity(a).is_some());
        assert!(zone.spawn_with_id(a, actor("C", 0.0, 0.0)).is_err());
    }

    #[test]
    fn test_not_ready_is_inactive() {
        let mut zone = Zone::new(1, "Test");
        let id = zone.spawn(actor("A", 0.0, 0.0)).unwrap();
        zone.get_mut::<Combatant>(id).unwrap().ready = false;

        assert!(zone.contains(id));
        assert!(zone.active_entity(id).is_none());
    }

    #[test]
    fn test_radius_and_fov() {
        let mut zone = Zone::new(1, "Test");
        let origin = zone.spawn(actor("Origin", 0.0, 0.0)).unwrap();
        let ahead = zone.spawn(actor("Ahead", 100.0, 0.0)).unwrap();
        let behind = zone.spawn(actor("Behind", -100.0, 0.0)).unwrap();
        let far = zone.spawn(actor("Far", 1000.0, 0.0)).unwrap();

        let near = zone.entities_in_radius(Point::default(), 200.0);
        assert_eq!(near, vec![origin, ahead, behind]);
        assert!(!near.contains(&far));

        let seen = zone.entities_in_fov(&[ahead, behind], Point::default(), 0.0, PI / 4.0);
        assert_eq!(seen, vec![ahead]);

        let all = zone.entities_in_fov(&[ahead, behind], Point::default(), 0.0, PI);
        assert_eq!(all, vec![ahead, behind]);
    }

    #[test]
    fn test_despawn_scrubs_references() {
        let mut zone = Zone::new(1, "Test");
        let a = zone.spawn(actor("A", 0.0, 0.0)).unwrap();
        let b = zone.spawn(actor("B", 0.0, 0.0)).unwrap();

        zone.add_pursuer(a, b);
        zone.add_opponents(a, b);
        assert!(zone.mark_for_despawn(b));
        assert!(!zone.mark_for_despawn(b));
        assert!(zone.active_entity(b).is_none());

        assert_eq!(zone.flush_despawns(), vec![b]);
        assert!(!zone.contains(b));
        assert!(zone.pursuers(a).is_empty());
        assert!(!zone.combatant(a).unwrap().in_combat());
        assert_eq!(zone.event_bus().queue_len(), 1);
    }

    #[test]
    fn test_take_and_restore_ai() {
        let mut zone = Zone::new(1, "Test");
        let id = zone.spawn(actor("A", 0.0, 0.0)).unwrap();
        let entity = zone.entity(id).unwrap();
        zone.world_mut()
            .insert_one(entity, AiState::new(Arc::new(LogicGroup::default())))
            .unwrap();

        assert_eq!(zone.ai_entity_ids(), vec![id]);
        let ai = zone.take_ai(id).unwrap();
        assert!(!zone.has_ai(id));
        assert!(zone.restore_ai(id, ai));
        assert!(zone.has_ai(id));
    }

    #[test]
    fn test_prune_pursuers() {
        let mut zone = Zone::new(1, "Test");
        let target = zone.spawn(actor("Target", 0.0, 0.0)).unwrap();
        let gone = zone.spawn(actor("Gone", 0.0, 0.0)).unwrap();
        let elsewhere = zone.spawn(actor("Elsewhere", 0.0, 0.0)).unwrap();

        let entity = zone.entity(elsewhere).unwrap();
        zone.world_mut()
            .insert_one(entity, AiState::new(Arc::new(LogicGroup::default())))
            .unwrap();

        zone.add_pursuer(target, gone);
        zone.add_pursuer(target, elsewhere);
        zone.mark_for_despawn(gone);

        zone.prune_pursuers(target);
        assert!(zone.pursuers(target).is_empty());
    }

    #[test]
    fn test_random_point_in_region() {
        let zone = Zone::new(1, "Test");
        let region = SpawnRegion::Polygon {
            points: vec![
                Point::new(0.0, 0.0),
                Point::new(100.0, 0.0),
                Point::new(0.0, 100.0),
            ],
        };
        let mut rng = seeded(3);
        for _ in 0..50 {
            let point = zone.random_point_in_region(&region, &mut rng);
            assert!(region.contains(point) || point == region.center());
        }
    }
}
