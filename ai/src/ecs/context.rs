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
//! World context holding every zone run by this server
//!
//! Each zone sits behind its own `tokio::sync::Mutex` together with the
//! random source its AI draws from. A tick locks each zone once and runs
//! every AI controlled entity in it, so a zone only ever has one writer.
//! Different zones are ticked concurrently on the tokio runtime.

use crate::clock::ServerClock;
use crate::config::{ActorDefinition, Configuration};
use crate::ecs::actor_builder::ActorBuilder;
use crate::ecs::components::{Combatant, EntityId, Name};
use crate::ecs::events::{EventBus, MovementNotification};
use crate::ecs::geometry::SegmentGeometry;
use crate::ecs::systems::AiManager;
use crate::ecs::zone::Zone;
use crate::error::AiError;
use crate::random::{from_entropy, seeded};
use rand::rngs::StdRng;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::Mutex;

/// A zone and the random source its AI uses
#[derive(Debug)]
pub struct ZoneHandle {
    pub zone: Zone,
    pub rng: StdRng,
}

/// Shared handle to a locked zone
pub type SharedZone = Arc<Mutex<ZoneHandle>>;

/// World context that owns all zones and the AI manager driving them
pub struct WorldContext {
    zones: HashMap<u32, SharedZone>,
    manager: Arc<AiManager>,
    clock: ServerClock,
    event_bus: EventBus,
    seed: Option<u64>,
}

impl WorldContext {
    /// Create an empty world driven by `manager`
    pub fn new(manager: Arc<AiManager>) -> Self {
        Self {
            zones: HashMap::new(),
            manager,
            clock: ServerClock::new(),
            event_bus: EventBus::new(),
            seed: None,
        }
    }

    /// Seed every zone's random source for reproducible runs
    ///
    /// Each zone gets its own stream derived from the seed and its id.
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }

    /// Build the manager and every configured zone
    ///
    /// Actors with a behavior are prepared for AI control. An actor that
    /// fails to prepare is left in the zone without AI.
    pub fn from_configuration(configuration: &Configuration) -> Result<Self, AiError> {
        let manager = Arc::new(AiManager::from_configuration(configuration));
        let mut context = Self::new(manager);
        if let Some(seed) = configuration.server.seed.as_ref() {
            context = context.with_seed(**seed);
        }

        for definition in &configuration.zones {
            let mut zone = Zone::new(definition.id, definition.name.clone())
                .with_geometry(SegmentGeometry::new(definition.walls.iter().copied()));

            let mut prepared = 0;
            for actor in &definition.actors {
                let id = zone.spawn(actor_builder(actor))?;
                if let Some(behavior) = actor.behavior.as_deref() {
                    if context.manager.prepare(&mut zone, id, Some(behavior)) {
                        prepared += 1;
                    }
                }
            }

            tracing::info!(
                "Loaded zone {} '{}' with {} actors ({} AI controlled)",
                definition.id,
                definition.name,
                zone.len(),
                prepared
            );
            context.add_zone(zone);
        }

        Ok(context)
    }

    // ============================================================================
    // Accessors
    // ============================================================================

    pub fn manager(&self) -> &Arc<AiManager> {
        &self.manager
    }

    pub fn clock(&self) -> &ServerClock {
        &self.clock
    }

    /// Event bus shared by every zone
    pub fn event_bus(&self) -> &EventBus {
        &self.event_bus
    }

    pub fn len(&self) -> usize {
        self.zones.len()
    }

    pub fn is_empty(&self) -> bool {
        self.zones.is_empty()
    }

    /// Zone ids in ascending order
    pub fn zone_ids(&self) -> Vec<u32> {
        let mut ids: Vec<u32> = self.zones.keys().copied().collect();
        ids.sort();
        ids
    }

    pub fn zone(&self, id: u32) -> Option<SharedZone> {
        self.zones.get(&id).cloned()
    }

    // ============================================================================
    // Zone management
    // ============================================================================

    /// Add a zone, attaching it to the shared event bus
    ///
    /// A zone with the same id is replaced.
    pub fn add_zone(&mut self, zone: Zone) -> SharedZone {
        let id = zone.id();
        let rng = match self.seed {
            Some(seed) => seeded(seed ^ u64::from(id)),
            None => from_entropy(),
        };
        let handle = Arc::new(Mutex::new(ZoneHandle {
            zone: zone.with_event_bus(self.event_bus.clone()),
            rng,
        }));
        if self.zones.insert(id, handle.clone()).is_some() {
            tracing::warn!("Replaced zone {}", id);
        }
        handle
    }

    pub fn remove_zone(&mut self, id: u32) -> Option<SharedZone> {
        self.zones.remove(&id)
    }

    // ============================================================================
    // Ticking
    // ============================================================================

    /// Tick every zone at the current server time
    pub async fn tick(&self) -> Vec<MovementNotification> {
        self.tick_all(self.clock.now()).await
    }

    /// Tick every zone at `now`, one tokio task per zone
    ///
    /// Entities marked for despawn during the tick are removed before the
    /// zone is unlocked. Notifications are returned in zone id order.
    pub async fn tick_all(&self, now: u64) -> Vec<MovementNotification> {
        let mut tasks = Vec::with_capacity(self.zones.len());
        for id in self.zone_ids() {
            let Some(handle) = self.zone(id) else {
                continue;
            };
            let manager = self.manager.clone();
            tasks.push((
                id,
                tokio::spawn(async move {
                    let mut guard = handle.lock().await;
                    let ZoneHandle { zone, rng } = &mut *guard;
                    let notifications = manager.update_active_states(zone, now, rng);
                    zone.flush_despawns();
                    notifications
                }),
            ));
        }

        let mut notifications = Vec::new();
        for (id, task) in tasks {
            match task.await {
                Ok(zone_notifications) => notifications.extend(zone_notifications),
                Err(e) => tracing::error!("Tick of zone {} failed: {}", id, e),
            }
        }
        notifications
    }

    /// Run `f` against a locked zone
    pub async fn with_zone<R>(&self, id: u32, f: impl FnOnce(&mut Zone) -> R) -> Option<R> {
        let handle = self.zone(id)?;
        let mut guard = handle.lock().await;
        Some(f(&mut guard.zone))
    }
}

impl std::fmt::Debug for WorldContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WorldContext")
            .field("zones", &self.zone_ids())
            .field("manager", &self.manager)
            .field("seed", &self.seed)
            .finish()
    }
}

fn actor_builder(actor: &ActorDefinition) -> ActorBuilder {
    let combatant = Combatant::new(actor.faction_group, actor.max_hp, actor.max_mp)
        .with_skills(actor.skills.iter().copied());
    let builder = ActorBuilder::new(actor.name.clone(), actor.kind)
        .at(actor.position)
        .facing(actor.rotation)
        .with_speed(actor.run_speed)
        .with_combatant(combatant);
    match &actor.origin {
        Some(origin) => builder.with_origin(origin.clone()),
        None => builder,
    }
}

/// Find the first entity with a given name in a zone
pub fn find_by_name(zone: &Zone, name: &str) -> Option<EntityId> {
    zone.registry()
        .ids()
        .find(|id| zone.get::<Name>(*id).is_some_and(|n| n.display == name))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ecs::components::{AiState, AiStatus, EntityKind, Point};
    use crate::ecs::test_utils::{spawn_monster, spawn_player, test_manager};

    #[tokio::test]
    async fn test_tick_all_runs_every_zone() {
        let manager = Arc::new(test_manager());
        let mut context = WorldContext::new(manager.clone()).with_seed(9);

        for id in [1, 2] {
            let mut zone = Zone::new(id, format!("Zone {}", id));
            let slime = spawn_monster(&mut zone, "Slime", Point::new(0.0, 0.0));
            assert!(manager.prepare(&mut zone, slime, None));
            assert!(manager.queue_move(&mut zone, slime, Point::new(100.0, 0.0), false));
            context.add_zone(zone);
        }

        let notifications = context.tick_all(100_000).await;
        assert_eq!(notifications.len(), 2);
        assert_eq!(context.event_bus().queue_len(), 2);
    }

    #[test]
    fn test_tick_flushes_despawns() {
        let mut context = WorldContext::new(Arc::new(test_manager()));
        let mut zone = Zone::new(1, "Test");
        let slime = spawn_monster(&mut zone, "Slime", Point::new(0.0, 0.0));
        zone.mark_for_despawn(slime);
        context.add_zone(zone);

        let remaining = tokio_test::block_on(async {
            context.tick_all(0).await;
            context.with_zone(1, |zone| zone.len()).await
        });
        assert_eq!(remaining, Some(0));
    }

    #[tokio::test]
    async fn test_from_configuration() {
        let yaml = r#"
behaviors:
  - id: guard
    logic_group: default
zones:
  - id: 7
    name: Gate
    actors:
      - name: Guard
        kind: Ally
        position: { x: 0.0, y: 0.0 }
        faction_group: 1
        behavior: guard
      - name: Traveller
        kind: Character
        position: { x: 10.0, y: 0.0 }
        faction_group: 1
"#;
        let configuration: Configuration = serde_yaml::from_str(yaml).unwrap();
        let context = WorldContext::from_configuration(&configuration).unwrap();
        assert_eq!(context.zone_ids(), vec![7]);

        let statuses = context
            .with_zone(7, |zone| {
                let guard = find_by_name(zone, "Guard").unwrap();
                let traveller = find_by_name(zone, "Traveller").unwrap();
                (
                    zone.get::<AiState>(guard).map(|ai| ai.status()),
                    zone.has_ai(traveller),
                    zone.kind(traveller),
                )
            })
            .await
            .unwrap();
        assert_eq!(statuses, (Some(AiStatus::Idle), false, Some(EntityKind::Character)));
    }

    #[tokio::test]
    async fn test_zone_replacement() {
        let mut context = WorldContext::new(Arc::new(test_manager()));
        context.add_zone(Zone::new(1, "Old"));
        let mut zone = Zone::new(1, "New");
        spawn_player(&mut zone, "Hero", Point::new(0.0, 0.0));
        context.add_zone(zone);

        assert_eq!(context.len(), 1);
        let name = context.with_zone(1, |zone| zone.name().to_string()).await;
        assert_eq!(name, Some("New".to_string()));
    }
}
