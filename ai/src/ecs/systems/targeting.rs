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
//! Target acquisition and aggro bookkeeping

use crate::ecs::abilities::AbilityService;
use crate::ecs::components::{AiState, Combatant, EntityId, EntityKind, Line, Point};
use crate::ecs::events::GameEvent;
use crate::ecs::hooks::{HookContext, HookRegistry, HookResult, TARGET_ACTION};
use crate::ecs::zone::Zone;
use crate::random::RandomSource;

/// One radius and view cone to search for targets in
#[derive(Debug, Clone, Copy)]
struct ScanPass {
    radius: f32,
    half_fov: f32,
    charging_only: bool,
}

/// Finds targets for AI controlled entities
#[derive(Debug, Clone)]
pub struct TargetingSystem {
    aggro_limit_enabled: bool,
}

impl TargetingSystem {
    pub fn new(aggro_limit_enabled: bool) -> Self {
        Self {
            aggro_limit_enabled,
        }
    }

    /// Whether `target` is still worth pursuing
    pub fn is_valid_target(&self, zone: &Zone, id: EntityId, ai: &AiState, target: EntityId) -> bool {
        if zone.active_entity(target).is_none() {
            return false;
        }
        let targetable = zone
            .get::<Combatant>(target)
            .is_some_and(|c| c.is_alive() && !c.ai_ignored);
        if !targetable {
            return false;
        }
        match (zone.position(id), zone.position(target)) {
            (Some(source), Some(dest)) => {
                source.distance(dest) <= ai.logic_group().deaggro_distance
            }
            _ => false,
        }
    }

    /// Candidate targets for an entity that has no combat opponents yet
    fn hostile_candidate(&self, zone: &Zone, id: EntityId, faction: i32, candidate: EntityId) -> bool {
        candidate != id
            && zone.active_entity(candidate).is_some()
            && zone
                .get::<Combatant>(candidate)
                .is_some_and(|c| c.is_alive() && !c.ai_ignored && c.faction_group != faction)
    }

    /// Whether `candidate` can take on another pursuer
    ///
    /// Partners and their owners share a single pool of pursuers.
    fn under_aggro_limit(&self, zone: &mut Zone, id: EntityId, candidate: EntityId, limit: usize) -> bool {
        if !self.aggro_limit_enabled {
            return true;
        }

        zone.prune_pursuers(candidate);
        let mut pursuers = zone.pursuers(candidate);
        let linked = zone.get::<Combatant>(candidate).and_then(|c| c.linked);
        if let Some(linked) = linked {
            zone.prune_pursuers(linked);
            pursuers.extend(zone.pursuers(linked));
        }
        pursuers.remove(&id);

        pursuers.len() < limit
    }

    fn scan(
        &self,
        zone: &mut Zone,
        id: EntityId,
        faction: i32,
        position: Point,
        rotation: f32,
        pass: ScanPass,
        limit: usize,
    ) -> Vec<EntityId> {
        let nearby = zone.entities_in_radius(position, pass.radius);
        let in_view = zone.entities_in_fov(&nearby, position, rotation, pass.half_fov);

        let mut found = Vec::new();
        for candidate in in_view {
            if !self.hostile_candidate(zone, id, faction, candidate) {
                continue;
            }
            if pass.charging_only
                && !zone
                    .get::<Combatant>(candidate)
                    .is_some_and(|c| c.is_charging())
            {
                continue;
            }
            if !self.under_aggro_limit(zone, id, candidate, limit) {
                continue;
            }
            let Some(dest) = zone.position(candidate) else {
                continue;
            };
            if zone.has_line_of_sight_collision(&Line::new(position, dest)) {
                continue;
            }
            found.push(candidate);
        }
        found
    }

    /// Gather every target the entity could pick right now
    ///
    /// Entities already fighting only consider their opponents. Everyone
    /// else is throttled by their refresh interval and aggression, then
    /// looks for entities charging skills nearby before falling back to a
    /// normal sight check.
    pub fn candidates(
        &self,
        zone: &mut Zone,
        id: EntityId,
        ai: &mut AiState,
        rng: &mut dyn RandomSource,
        now: u64,
    ) -> Vec<EntityId> {
        let (Some(combatant), Some(motion)) = (zone.combatant(id), zone.motion(id)) else {
            return Vec::new();
        };

        if combatant.in_combat() {
            let mut opponents: Vec<EntityId> = combatant
                .opponents
                .iter()
                .copied()
                .filter(|opponent| self.is_valid_target(zone, id, ai, *opponent))
                .collect();
            opponents.sort();
            return opponents;
        }

        if now < ai.next_target_time() {
            return Vec::new();
        }

        let group = ai.logic_group();
        let retry_at = now + group.target_refresh_ms * 1000;
        let limit = group.aggro_limit;
        let passes = [
            ScanPass {
                radius: group.aggro_cast_distance,
                half_fov: group.cast_half_fov(),
                charging_only: true,
            },
            ScanPass {
                radius: group.aggro_normal_distance,
                half_fov: group.normal_half_fov(),
                charging_only: false,
            },
        ];

        if !rng.chance(group.aggression) {
            ai.set_next_target_time(retry_at);
            return Vec::new();
        }

        for pass in passes {
            let found = self.scan(
                zone,
                id,
                combatant.faction_group,
                motion.current,
                motion.rotation,
                pass,
                limit,
            );
            if !found.is_empty() {
                return found;
            }
        }

        tracing::trace!("{} found nothing to target", id);
        ai.set_next_target_time(retry_at);
        Vec::new()
    }

    /// Pick one of `candidates`, consulting a target hook if configured
    pub fn select(
        &self,
        zone: &mut Zone,
        id: EntityId,
        ai: &mut AiState,
        hooks: &HookRegistry,
        rng: &mut dyn RandomSource,
        now: u64,
        candidates: &[EntityId],
    ) -> Option<EntityId> {
        if candidates.is_empty() {
            return None;
        }

        if let Some(hook) = ai.policy(TARGET_ACTION).hook().map(str::to_owned) {
            let mut context = HookContext {
                zone,
                entity: id,
                ai,
                rng: &mut *rng,
                now,
                action: TARGET_ACTION,
                candidates,
                selected: None,
            };
            match hooks.call(&hook, &mut context) {
                HookResult::Done => {
                    return context.selected.filter(|s| candidates.contains(s));
                }
                HookResult::Error => return None,
                HookResult::Pending => {}
            }
        }

        candidates.get(rng.index(candidates.len())).copied()
    }

    /// Look for a new target
    pub fn find_target(
        &self,
        zone: &mut Zone,
        id: EntityId,
        ai: &mut AiState,
        hooks: &HookRegistry,
        rng: &mut dyn RandomSource,
        now: u64,
    ) -> Option<EntityId> {
        let candidates = self.candidates(zone, id, ai, rng, now);
        self.select(zone, id, ai, hooks, rng, now, &candidates)
    }

    /// Point an entity at a new target and keep pursuer sets in step
    pub fn update_aggro(
        &self,
        zone: &mut Zone,
        id: EntityId,
        ai: &mut AiState,
        abilities: &dyn AbilityService,
        target: Option<EntityId>,
    ) {
        let old = ai.target();
        if old == target {
            return;
        }

        if let Some(old) = old {
            zone.remove_pursuer(old, id);
        }
        if let Some(new) = target {
            zone.add_pursuer(new, id);
        }
        ai.set_target(target);
        // Untargeted commands stay untargeted
        if old.is_some() {
            ai.retarget_commands(old, target);
        }

        // Only activations aimed at the old target follow it
        let aimed_at_old = old.is_some()
            && zone
                .get::<Combatant>(id)
                .is_some_and(|c| c.activated.as_ref().is_some_and(|a| a.target == old));
        if aimed_at_old {
            abilities.target_changed(zone, id, target);
        }

        if zone.kind(id) == Some(EntityKind::Enemy) {
            let event = match target {
                Some(target) => GameEvent::TargetAcquired { entity: id, target },
                None => GameEvent::TargetLost { entity: id },
            };
            zone.event_bus().publish(event);
        }
        tracing::debug!("{} now targets {:?}", id, target);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ecs::abilities::BasicAbilityService;
    use crate::ecs::actor_builder::ActorBuilder;
    use crate::ecs::components::{ActivatedAbility, AiCommand, LogicGroup, SkillCatalog};
    use crate::ecs::geometry::SegmentGeometry;
    use crate::random::{SequenceRandom, seeded};
    use std::f32::consts::PI;
    use std::sync::Arc;

    fn spawn(zone: &mut Zone, name: &str, kind: EntityKind, faction: i32, at: Point) -> EntityId {
        zone.spawn(
            ActorBuilder::new(name, kind)
                .at(at)
                .with_combatant(Combatant::new(faction, 100, 0)),
        )
        .unwrap()
    }

    fn wolf_zone() -> (Zone, EntityId, AiState) {
        let mut zone = Zone::new(1, "Forest");
        let wolf = spawn(&mut zone, "Wolf", EntityKind::Enemy, 2, Point::new(0.0, 0.0));
        let ai = AiState::new(Arc::new(LogicGroup::default()));
        (zone, wolf, ai)
    }

    fn abilities() -> BasicAbilityService {
        BasicAbilityService::new(Arc::new(SkillCatalog::new()))
    }

    #[test]
    fn test_candidate_filters() {
        let (mut zone, wolf, mut ai) = wolf_zone();
        let hero = spawn(&mut zone, "Hero", EntityKind::Character, 1, Point::new(500.0, 0.0));
        let dead = spawn(&mut zone, "Dead", EntityKind::Character, 1, Point::new(600.0, 0.0));
        let ignored = spawn(&mut zone, "Ghost", EntityKind::Character, 1, Point::new(700.0, 0.0));
        spawn(&mut zone, "Pack", EntityKind::Enemy, 2, Point::new(300.0, 0.0));
        spawn(&mut zone, "Behind", EntityKind::Character, 1, Point::new(-500.0, 0.0));
        spawn(&mut zone, "Far", EntityKind::Character, 1, Point::new(2500.0, 0.0));

        zone.get_mut::<Combatant>(dead).unwrap().hp = 0;
        zone.get_mut::<Combatant>(ignored).unwrap().ai_ignored = true;

        let system = TargetingSystem::new(true);
        let candidates = system.candidates(&mut zone, wolf, &mut ai, &mut seeded(1), 0);
        assert_eq!(candidates, vec![hero]);
    }

    #[test]
    fn test_line_of_sight_blocks() {
        let wall = Line::new(Point::new(250.0, -100.0), Point::new(250.0, 100.0));
        let mut zone = Zone::new(1, "Cave").with_geometry(SegmentGeometry::new(vec![wall]));
        let wolf = spawn(&mut zone, "Wolf", EntityKind::Enemy, 2, Point::new(0.0, 0.0));
        spawn(&mut zone, "Hero", EntityKind::Character, 1, Point::new(500.0, 0.0));
        let mut ai = AiState::new(Arc::new(LogicGroup::default()));

        let system = TargetingSystem::new(true);
        assert!(system.candidates(&mut zone, wolf, &mut ai, &mut seeded(1), 0).is_empty());
    }

    #[test]
    fn test_charging_entities_take_priority() {
        let (mut zone, wolf, mut ai) = wolf_zone();
        spawn(&mut zone, "Hero", EntityKind::Character, 1, Point::new(500.0, 0.0));
        let mage = spawn(&mut zone, "Mage", EntityKind::Character, 1, Point::new(-2500.0, 0.0));
        zone.get_mut::<Combatant>(mage).unwrap().activated =
            Some(crate::ecs::components::ActivatedAbility {
                activation_id: 1,
                skill_id: 1,
                target: None,
                activation_time: 0,
                charged_time: 1_000_000,
            });

        let system = TargetingSystem::new(true);
        let candidates = system.candidates(&mut zone, wolf, &mut ai, &mut seeded(1), 0);
        assert_eq!(candidates, vec![mage]);
    }

    #[test]
    fn test_refresh_throttle() {
        let (mut zone, wolf, mut ai) = wolf_zone();
        let system = TargetingSystem::new(true);

        assert!(system.candidates(&mut zone, wolf, &mut ai, &mut seeded(1), 0).is_empty());
        assert_eq!(ai.next_target_time(), 1_000_000);

        let hero = spawn(&mut zone, "Hero", EntityKind::Character, 1, Point::new(500.0, 0.0));
        assert!(system.candidates(&mut zone, wolf, &mut ai, &mut seeded(1), 500_000).is_empty());
        assert_eq!(
            system.candidates(&mut zone, wolf, &mut ai, &mut seeded(1), 1_000_000),
            vec![hero]
        );
    }

    #[test]
    fn test_aggression_roll() {
        let mut group = LogicGroup::default();
        group.aggression = 50;
        let (mut zone, wolf, _) = wolf_zone();
        let mut ai = AiState::new(Arc::new(group));
        spawn(&mut zone, "Hero", EntityKind::Character, 1, Point::new(500.0, 0.0));

        let system = TargetingSystem::new(true);
        let mut rng = SequenceRandom::new([80]);
        assert!(system.candidates(&mut zone, wolf, &mut ai, &mut rng, 0).is_empty());
        assert_eq!(ai.next_target_time(), 1_000_000);
    }

    #[test]
    fn test_aggro_limit_shared_with_partner() {
        let mut group = LogicGroup::default();
        group.aggro_limit = 1;
        let (mut zone, wolf, _) = wolf_zone();
        let mut ai = AiState::new(Arc::new(group));
        let hero = spawn(&mut zone, "Hero", EntityKind::Character, 1, Point::new(2500.0, 0.0));
        let pixie = zone
            .spawn(
                ActorBuilder::new("Pixie", EntityKind::Partner)
                    .at(Point::new(500.0, 0.0))
                    .with_combatant(Combatant::new(1, 100, 0).with_link(hero)),
            )
            .unwrap();
        let other = spawn(&mut zone, "Other", EntityKind::Enemy, 2, Point::new(2400.0, 0.0));
        let mut other_ai = AiState::new(Arc::new(LogicGroup::default()));
        other_ai.set_target(Some(hero));
        let other_entity = zone.entity(other).unwrap();
        zone.world_mut().insert_one(other_entity, other_ai).unwrap();
        zone.add_pursuer(hero, other);

        let system = TargetingSystem::new(true);
        assert!(system.candidates(&mut zone, wolf, &mut ai, &mut seeded(1), 0).is_empty());

        let unlimited = TargetingSystem::new(false);
        ai.set_next_target_time(0);
        assert_eq!(
            unlimited.candidates(&mut zone, wolf, &mut ai, &mut seeded(1), 0),
            vec![pixie]
        );
    }

    #[test]
    fn test_combat_candidates_are_opponents() {
        let (mut zone, wolf, mut ai) = wolf_zone();
        let hero = spawn(&mut zone, "Hero", EntityKind::Character, 1, Point::new(500.0, 0.0));
        let ally = spawn(&mut zone, "Ally", EntityKind::Ally, 1, Point::new(400.0, 0.0));
        let far = spawn(&mut zone, "Far", EntityKind::Character, 1, Point::new(9000.0, 0.0));
        zone.add_opponents(wolf, hero);
        zone.add_opponents(wolf, far);

        let system = TargetingSystem::new(true);
        let candidates = system.candidates(&mut zone, wolf, &mut ai, &mut seeded(1), 0);
        assert_eq!(candidates, vec![hero]);
        assert!(!candidates.contains(&ally));
    }

    #[test]
    fn test_fov_cone() {
        let (mut zone, wolf, mut ai) = wolf_zone();
        zone.get_mut::<crate::ecs::components::Motion>(wolf)
            .unwrap()
            .warp(Point::new(0.0, 0.0), PI, 0);
        spawn(&mut zone, "Hero", EntityKind::Character, 1, Point::new(500.0, 0.0));

        let system = TargetingSystem::new(true);
        assert!(system.candidates(&mut zone, wolf, &mut ai, &mut seeded(1), 0).is_empty());
    }

    #[test]
    fn test_select_with_hook() {
        let (mut zone, wolf, mut ai) = wolf_zone();
        let a = spawn(&mut zone, "A", EntityKind::Character, 1, Point::new(100.0, 0.0));
        let b = spawn(&mut zone, "B", EntityKind::Character, 1, Point::new(200.0, 0.0));

        let mut hooks = HookRegistry::new();
        hooks.register("last", |ctx: &mut HookContext<'_>| {
            ctx.selected = ctx.candidates.last().copied();
            HookResult::Done
        });
        hooks.register("refuse", |_: &mut HookContext<'_>| HookResult::Error);
        ai.set_policy(TARGET_ACTION, crate::ecs::hooks::BehaviorPolicy::NamedOverride("last".into()));

        let system = TargetingSystem::new(true);
        let mut rng = seeded(3);
        assert_eq!(
            system.select(&mut zone, wolf, &mut ai, &hooks, &mut rng, 0, &[a, b]),
            Some(b)
        );

        ai.set_policy(TARGET_ACTION, crate::ecs::hooks::BehaviorPolicy::NamedOverride("refuse".into()));
        assert_eq!(
            system.select(&mut zone, wolf, &mut ai, &hooks, &mut rng, 0, &[a, b]),
            None
        );
    }

    #[test]
    fn test_update_aggro_is_symmetric() {
        let (mut zone, wolf, mut ai) = wolf_zone();
        let a = spawn(&mut zone, "A", EntityKind::Character, 1, Point::new(100.0, 0.0));
        let b = spawn(&mut zone, "B", EntityKind::Character, 1, Point::new(200.0, 0.0));
        let system = TargetingSystem::new(true);
        let abilities = abilities();

        system.update_aggro(&mut zone, wolf, &mut ai, &abilities, Some(a));
        assert_eq!(ai.target(), Some(a));
        assert!(zone.pursuers(a).contains(&wolf));

        system.update_aggro(&mut zone, wolf, &mut ai, &abilities, Some(b));
        assert!(!zone.pursuers(a).contains(&wolf));
        assert!(zone.pursuers(b).contains(&wolf));

        system.update_aggro(&mut zone, wolf, &mut ai, &abilities, None);
        assert!(zone.pursuers(b).is_empty());

        let events = zone.event_bus().drain();
        assert_eq!(
            events,
            vec![
                GameEvent::TargetAcquired { entity: wolf, target: a },
                GameEvent::TargetAcquired { entity: wolf, target: b },
                GameEvent::TargetLost { entity: wolf },
            ]
        );
    }

    fn activate(zone: &Zone, id: EntityId, target: Option<EntityId>) {
        zone.get_mut::<Combatant>(id).unwrap().activated = Some(ActivatedAbility {
            activation_id: 1,
            skill_id: 2,
            target,
            activation_time: 0,
            charged_time: 500_000,
        });
    }

    fn activation_target(zone: &Zone, id: EntityId) -> Option<EntityId> {
        zone.combatant(id).unwrap().activated.unwrap().target
    }

    #[test]
    fn test_self_targeted_activation_keeps_target() {
        let (mut zone, wolf, mut ai) = wolf_zone();
        let a = spawn(&mut zone, "A", EntityKind::Character, 1, Point::new(100.0, 0.0));
        let b = spawn(&mut zone, "B", EntityKind::Character, 1, Point::new(200.0, 0.0));
        let system = TargetingSystem::new(true);
        let abilities = abilities();

        system.update_aggro(&mut zone, wolf, &mut ai, &abilities, Some(a));
        activate(&zone, wolf, Some(wolf));
        ai.queue_command(AiCommand::use_skill(2, Some(wolf)), false);

        system.update_aggro(&mut zone, wolf, &mut ai, &abilities, Some(b));
        assert_eq!(activation_target(&zone, wolf), Some(wolf));
        assert_eq!(ai.current_command().unwrap().target(), Some(wolf));
    }

    #[test]
    fn test_activation_on_old_target_follows_retarget() {
        let (mut zone, wolf, mut ai) = wolf_zone();
        let a = spawn(&mut zone, "A", EntityKind::Character, 1, Point::new(100.0, 0.0));
        let b = spawn(&mut zone, "B", EntityKind::Character, 1, Point::new(200.0, 0.0));
        let system = TargetingSystem::new(true);
        let abilities = abilities();

        system.update_aggro(&mut zone, wolf, &mut ai, &abilities, Some(a));
        activate(&zone, wolf, Some(a));
        ai.queue_command(AiCommand::use_skill(1, Some(a)), false);

        system.update_aggro(&mut zone, wolf, &mut ai, &abilities, Some(b));
        assert_eq!(activation_target(&zone, wolf), Some(b));
        assert_eq!(ai.current_command().unwrap().target(), Some(b));
    }

    #[test]
    fn test_first_target_leaves_untargeted_commands_alone() {
        let (mut zone, wolf, mut ai) = wolf_zone();
        let a = spawn(&mut zone, "A", EntityKind::Character, 1, Point::new(100.0, 0.0));
        let system = TargetingSystem::new(true);
        let abilities = abilities();

        activate(&zone, wolf, None);
        ai.queue_command(AiCommand::move_path([Point::new(50.0, 50.0)]), false);
        ai.queue_command(AiCommand::use_skill(2, None), false);

        system.update_aggro(&mut zone, wolf, &mut ai, &abilities, Some(a));
        assert!(ai.commands().all(|c| c.target().is_none()));
        assert_eq!(activation_target(&zone, wolf), None);
    }
}
