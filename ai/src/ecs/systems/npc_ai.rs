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
//! AI manager driving every AI controlled entity in a zone
//!
//! Each tick an entity's AI state is detached from the zone, run through
//! the status machine and its head command, then reattached. Decisions
//! that need the rest of the zone (targeting, pathing, skill choice) are
//! delegated to the smaller systems alongside this one.

use crate::config::{BehaviorDefinition, Configuration, EngineConfig};
use crate::ecs::abilities::{AbilityService, BasicAbilityService};
use crate::ecs::components::{
    AiCommand, AiState, AiStatus, CommandId, CommandKind, Combatant, EntityId, LogicGroup,
    MICROS_PER_SECOND, Motion, Point, SkillCatalog, SkillId, StatusTimer,
};
use crate::ecs::events::{GameEvent, MovementNotification};
use crate::ecs::hooks::{
    BehaviorPolicy, HookContext, HookRegistry, HookResult, PREPARE_ACTION, SCRIPT_ACTION,
};
use crate::ecs::systems::{PathingSystem, SkillSystem, TargetingSystem};
use crate::ecs::zone::Zone;
use crate::error::AiError;
use crate::random::{RandomSource, from_entropy};
use std::collections::HashMap;
use std::sync::Arc;

/// Logic group used by entities prepared without a behavior
pub const DEFAULT_LOGIC_GROUP: &str = "default";

/// Shortest and longest pause, in seconds, while sizing up a target
const COMBAT_WAIT_SECONDS: (i64, i64) = (1, 3);

/// Share of a skill's range to close to before using it
const SKILL_APPROACH_SHARE: f32 = 0.9;

/// Drives AI controlled entities
pub struct AiManager {
    config: EngineConfig,
    logic_groups: HashMap<String, Arc<LogicGroup>>,
    behaviors: HashMap<String, BehaviorDefinition>,
    abilities: Arc<dyn AbilityService>,
    hooks: HookRegistry,
    targeting: TargetingSystem,
    pathing: PathingSystem,
    skills: SkillSystem,
}

impl AiManager {
    /// Create a manager with only the default logic group
    pub fn new(
        config: EngineConfig,
        catalog: Arc<SkillCatalog>,
        abilities: Arc<dyn AbilityService>,
    ) -> Self {
        let mut logic_groups = HashMap::new();
        logic_groups.insert(
            DEFAULT_LOGIC_GROUP.to_string(),
            Arc::new(LogicGroup::default()),
        );

        Self {
            targeting: TargetingSystem::new(config.aggro_limit_enabled),
            pathing: PathingSystem::new(config.lazy_pathing),
            skills: SkillSystem::new(catalog),
            config,
            logic_groups,
            behaviors: HashMap::new(),
            abilities,
            hooks: HookRegistry::new(),
        }
    }

    /// Build a manager from loaded configuration
    ///
    /// Skills resolve through a [`BasicAbilityService`] sharing the
    /// configured skill catalog.
    pub fn from_configuration(configuration: &Configuration) -> Self {
        let catalog: Arc<SkillCatalog> =
            Arc::new(configuration.skills.iter().cloned().collect());
        let abilities = Arc::new(BasicAbilityService::new(catalog.clone()));

        let mut manager = Self::new(configuration.engine.clone(), catalog, abilities);
        for group in &configuration.logic_groups {
            manager = manager.with_logic_group(group.clone());
        }
        for behavior in &configuration.behaviors {
            manager = manager.with_behavior(behavior.clone());
        }
        manager
    }

    pub fn with_logic_group(mut self, group: LogicGroup) -> Self {
        self.logic_groups.insert(group.id.clone(), Arc::new(group));
        self
    }

    pub fn with_behavior(mut self, behavior: BehaviorDefinition) -> Self {
        self.behaviors.insert(behavior.id.clone(), behavior);
        self
    }

    pub fn with_hooks(mut self, hooks: HookRegistry) -> Self {
        self.hooks = hooks;
        self
    }

    pub fn with_ability_service(mut self, abilities: Arc<dyn AbilityService>) -> Self {
        self.abilities = abilities;
        self
    }

    /// Register a named behavior hook
    pub fn register_hook<F>(&mut self, name: impl Into<String>, hook: F)
    where
        F: Fn(&mut HookContext<'_>) -> HookResult + Send + Sync + 'static,
    {
        self.hooks.register(name, hook);
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn hooks(&self) -> &HookRegistry {
        &self.hooks
    }

    pub fn skills(&self) -> &SkillSystem {
        &self.skills
    }

    pub fn logic_group(&self, id: &str) -> Option<Arc<LogicGroup>> {
        self.logic_groups.get(id).cloned()
    }

    // ============================================================================
    // Preparation
    // ============================================================================

    /// Put an entity under AI control
    ///
    /// Returns false, after logging why, if the entity cannot be prepared.
    /// An entity that is already prepared is left untouched.
    pub fn prepare(&self, zone: &mut Zone, id: EntityId, behavior: Option<&str>) -> bool {
        match self.try_prepare(zone, id, behavior) {
            Ok(()) => true,
            Err(e) => {
                tracing::error!("Failed to prepare AI for {}: {}", id, e);
                false
            }
        }
    }

    fn try_prepare(
        &self,
        zone: &mut Zone,
        id: EntityId,
        behavior: Option<&str>,
    ) -> Result<(), AiError> {
        let entity = zone.entity(id).ok_or(AiError::EntityNotFound(id))?;
        if zone.has_ai(id) {
            tracing::trace!("{} is already AI controlled", id);
            return Ok(());
        }
        if zone.get::<Motion>(id).is_none() {
            return Err(AiError::MissingComponent(id, "Motion"));
        }
        if zone.get::<Combatant>(id).is_none() {
            return Err(AiError::MissingComponent(id, "Combatant"));
        }

        let definition = match behavior {
            Some(name) => Some(
                self.behaviors
                    .get(name)
                    .ok_or_else(|| AiError::UnknownBehavior(name.to_string()))?,
            ),
            None => None,
        };
        let group_id = definition.map_or(DEFAULT_LOGIC_GROUP, |d| d.logic_group.as_str());
        let group = self
            .logic_group(group_id)
            .ok_or_else(|| AiError::UnknownLogicGroup(group_id.to_string()))?;

        let mut ai = AiState::new(group);
        if let Some(definition) = definition {
            for (action, hook) in &definition.overrides {
                ai.set_policy(action.clone(), BehaviorPolicy::NamedOverride(hook.clone()));
            }
            ai.set_despawn_delay(
                definition
                    .despawn_after
                    .map(|seconds| seconds * MICROS_PER_SECOND),
            );
        }

        let has_spawn_area = zone
            .spawn_origin(id)
            .is_some_and(|origin| origin.has_spawn_area());
        let wanders = has_spawn_area || ai.logic_group().wander_distance > 0.0;
        ai.set_wanders(wanders);
        if wanders {
            ai.set_default_status(AiStatus::Wandering);
            ai.set_status(AiStatus::Wandering, false);
            ai.reset_status_changed();
        }

        if let Some(hook) = definition.and_then(|d| d.prepare.as_deref()) {
            let mut rng = from_entropy();
            let mut context = HookContext {
                zone: &mut *zone,
                entity: id,
                ai: &mut ai,
                rng: &mut rng,
                now: 0,
                action: PREPARE_ACTION,
                candidates: &[],
                selected: None,
            };
            if self.hooks.call(hook, &mut context) == HookResult::Error {
                return Err(AiError::PrepareHookFailed {
                    entity: id,
                    hook: hook.to_string(),
                });
            }
        }

        zone.world_mut().insert_one(entity, ai)?;
        tracing::debug!(
            "Prepared {} with behavior {:?} in zone {}",
            id,
            behavior,
            zone.id()
        );
        Ok(())
    }

    // ============================================================================
    // Tick driver
    // ============================================================================

    /// Advance every AI controlled entity in a zone by one tick
    ///
    /// Entities are processed in id order. Every entity whose motion changed
    /// yields a movement notification, which is both published on the zone's
    /// event bus and returned.
    pub fn update_active_states(
        &self,
        zone: &mut Zone,
        now: u64,
        rng: &mut dyn RandomSource,
    ) -> Vec<MovementNotification> {
        let mut notifications = Vec::new();
        for id in zone.ai_entity_ids() {
            if !self.update_entity(zone, id, now, rng) {
                continue;
            }
            if let Some(motion) = zone.get::<Motion>(id) {
                notifications.push(MovementNotification::from_motion(id, &motion, now));
            }
        }

        zone.event_bus()
            .publish_all(notifications.iter().cloned().map(GameEvent::from));
        notifications
    }

    /// Run one tick for a single entity; returns whether it visibly changed
    pub fn update_entity(
        &self,
        zone: &mut Zone,
        id: EntityId,
        now: u64,
        rng: &mut dyn RandomSource,
    ) -> bool {
        let Some(mut ai) = zone.take_ai(id) else {
            return false;
        };
        let changed = self.update_state(zone, id, &mut ai, now, rng);
        if !zone.restore_ai(id, ai) {
            tracing::trace!("{} left zone {} mid tick", id, zone.id());
        }
        changed
    }

    fn update_state(
        &self,
        zone: &mut Zone,
        id: EntityId,
        ai: &mut AiState,
        now: u64,
        rng: &mut dyn RandomSource,
    ) -> bool {
        if zone.is_pending_despawn(id) {
            return false;
        }

        ai.arm_despawn_timeout(now);
        if let Some(mut motion) = zone.get_mut::<Motion>(id) {
            motion.refresh(now);
        }
        if let Some(mut combatant) = zone.get_mut::<Combatant>(id) {
            combatant.expire_status_times(now);
        }

        if ai.despawn_timeout().is_some_and(|timeout| timeout <= now) {
            zone.mark_for_despawn(id);
            return false;
        }

        let (in_combat, can_act, waiting) = match zone.get::<Combatant>(id) {
            Some(c) => (
                c.in_combat(),
                c.can_act(),
                c.status_time(StatusTimer::Waiting).is_some(),
            ),
            None => return false,
        };

        if ai.is_idle()
            && ai.follow_target().is_none()
            && ai.command_count() == 0
            && !in_combat
            && ai.policy(ai.status().hook_action()).hook().is_none()
        {
            return false;
        }
        if !can_act || waiting {
            return false;
        }

        if ai.status_changed() {
            if !(ai.previous_status() == AiStatus::Aggro && ai.status() == AiStatus::Combat) {
                ai.clear_commands_keep_skill();
            }
            ai.reset_status_changed();
        }

        if ai.status().is_hostile() && !self.refresh_target(zone, id, ai, rng, now) {
            return false;
        }

        if ai.current_command().is_none() {
            self.follow(zone, id, ai);
        }
        if ai.current_command().is_none() {
            match self.run_status_hook(zone, id, ai, rng, now) {
                Some(HookResult::Error) => return false,
                Some(HookResult::Done) => return true,
                Some(HookResult::Pending) | None => self.decide(zone, id, ai, rng, now),
            }
        }

        self.process_command(zone, id, ai, rng, now)
    }

    /// Change status, clearing queued commands unless aggro turns to combat
    fn transition(ai: &mut AiState, status: AiStatus) {
        let from = ai.status();
        if ai.set_status(status, false) {
            if !(from == AiStatus::Aggro && status == AiStatus::Combat) {
                ai.clear_commands_keep_skill();
            }
            ai.reset_status_changed();
        }
    }

    fn run_status_hook(
        &self,
        zone: &mut Zone,
        id: EntityId,
        ai: &mut AiState,
        rng: &mut dyn RandomSource,
        now: u64,
    ) -> Option<HookResult> {
        let action = ai.status().hook_action();
        let hook = ai.policy(action).hook()?.to_string();
        let mut context = HookContext {
            zone,
            entity: id,
            ai,
            rng: &mut *rng,
            now,
            action,
            candidates: &[],
            selected: None,
        };
        Some(self.hooks.call(&hook, &mut context))
    }

    /// Keep an aggressive entity's target valid, retargeting if needed
    ///
    /// Returns false once the entity has given up and gone back to its
    /// default status.
    fn refresh_target(
        &self,
        zone: &mut Zone,
        id: EntityId,
        ai: &mut AiState,
        rng: &mut dyn RandomSource,
        now: u64,
    ) -> bool {
        let current = ai
            .target()
            .filter(|target| self.targeting.is_valid_target(zone, id, ai, *target));

        let target = match current {
            Some(target) => Some(target),
            None => self
                .targeting
                .find_target(zone, id, ai, &self.hooks, rng, now),
        };

        match target {
            Some(target) => {
                self.targeting
                    .update_aggro(zone, id, ai, self.abilities.as_ref(), Some(target));
                let in_combat = zone.get::<Combatant>(id).is_some_and(|c| c.in_combat());
                if ai.status() == AiStatus::Aggro && in_combat {
                    Self::transition(ai, AiStatus::Combat);
                }
                true
            }
            None => {
                tracing::debug!("{} lost its target", id);
                self.cancel_activation(zone, id);
                self.targeting
                    .update_aggro(zone, id, ai, self.abilities.as_ref(), None);
                ai.reset_to_default();
                ai.reset_status_changed();
                ai.clear_commands();
                false
            }
        }
    }

    fn cancel_activation(&self, zone: &mut Zone, id: EntityId) {
        let activation = zone
            .get::<Combatant>(id)
            .and_then(|c| c.activated.as_ref().map(|a| a.activation_id));
        if let Some(activation) = activation {
            self.abilities.cancel(zone, id, activation);
        }
    }

    /// Keep up with a follow target
    fn follow(&self, zone: &mut Zone, id: EntityId, ai: &mut AiState) {
        let Some(leader) = ai.follow_target() else {
            return;
        };
        let positions = zone
            .active_entity(leader)
            .and_then(|_| zone.position(leader).zip(zone.position(id)));
        let Some((leader_position, position)) = positions else {
            ai.set_follow_target(None);
            if ai.status() == AiStatus::Following {
                let status = ai.default_status();
                Self::transition(ai, status);
            }
            return;
        };

        let group = ai.logic_group();
        let follow_distance = group.follow_distance;
        let limit = if ai.status() == AiStatus::Aggro {
            follow_distance * group.follow_aggro_scale
        } else {
            follow_distance
        };

        if position.distance(leader_position) > limit {
            if ai.status().is_hostile() {
                self.targeting
                    .update_aggro(zone, id, ai, self.abilities.as_ref(), None);
            }
            Self::transition(ai, AiStatus::Following);
            if let Some(command) =
                self.pathing
                    .chase(zone, id, leader, follow_distance / 2.0, follow_distance)
            {
                ai.queue_command(command, false);
            }
        } else if ai.status() == AiStatus::Following {
            let status = ai.default_status();
            Self::transition(ai, status);
        }
    }

    // ============================================================================
    // Built-in decisions
    // ============================================================================

    fn decide(
        &self,
        zone: &mut Zone,
        id: EntityId,
        ai: &mut AiState,
        rng: &mut dyn RandomSource,
        now: u64,
    ) {
        match ai.status() {
            AiStatus::Idle | AiStatus::Wandering | AiStatus::Following => {
                self.decide_peaceful(zone, id, ai, rng, now)
            }
            AiStatus::Aggro | AiStatus::Combat => self.decide_hostile(zone, id, ai, rng, now),
        }
    }

    /// Look for trouble, otherwise wander
    fn decide_peaceful(
        &self,
        zone: &mut Zone,
        id: EntityId,
        ai: &mut AiState,
        rng: &mut dyn RandomSource,
        now: u64,
    ) {
        let in_combat = zone.get::<Combatant>(id).is_some_and(|c| c.in_combat());
        if ai.status() != AiStatus::Idle || in_combat {
            if let Some(target) = self
                .targeting
                .find_target(zone, id, ai, &self.hooks, rng, now)
            {
                self.targeting
                    .update_aggro(zone, id, ai, self.abilities.as_ref(), Some(target));
                let status = if in_combat {
                    AiStatus::Combat
                } else {
                    AiStatus::Aggro
                };
                Self::transition(ai, status);
                return;
            }
        }

        if ai.status() != AiStatus::Wandering || !ai.wanders() {
            return;
        }

        if let Some(command) = self.pathing.wander(zone, id, ai, rng) {
            ai.queue_command(command, false);
        }
        let group = ai.logic_group();
        let seconds = rng.range_inclusive(
            group.wander_wait_min as i64,
            group.wander_wait_max as i64,
        );
        ai.queue_command(AiCommand::wait_seconds(seconds.max(0) as u32), false);
    }

    /// Close in on and attack the current target
    fn decide_hostile(
        &self,
        zone: &mut Zone,
        id: EntityId,
        ai: &mut AiState,
        rng: &mut dyn RandomSource,
        now: u64,
    ) {
        let Some(target) = ai.target() else {
            return;
        };
        let (Some(position), Some(target_position)) = (zone.position(id), zone.position(target))
        else {
            return;
        };
        let distance = position.distance(target_position);

        let group = ai.logic_group();
        let strike_first = group.strike_first;
        let wait_chance = group.combat_wait_chance;
        let approach_distance = group.combat_approach_distance;
        let approach_reduce = group.combat_approach_reduce;
        let circle_distance = group.circle_distance;
        let slack = group.activation_slack;

        let activated = zone.get::<Combatant>(id).and_then(|c| c.activated.clone());
        if let Some(activated) = activated {
            let skill = self.skills.catalog().get(activated.skill_id).cloned();
            let targets_enemy = skill.as_ref().is_some_and(|s| s.targets_enemy());
            if targets_enemy && activated.target != Some(target) {
                tracing::debug!("{} switched targets mid activation", id);
                self.abilities.cancel(zone, id, activated.activation_id);
                return;
            }
            if let Some(skill) = skill.filter(|s| targets_enemy && s.is_range_limited()) {
                if distance > skill.range + slack {
                    let min = skill.range * SKILL_APPROACH_SHARE;
                    match self.pathing.chase(zone, id, target, min, skill.range) {
                        Some(command) => {
                            ai.queue_command(command, false);
                        }
                        None => {
                            self.abilities.cancel(zone, id, activated.activation_id);
                            return;
                        }
                    }
                }
            }
            ai.queue_command(AiCommand::use_activation(&activated), false);
            return;
        }

        if ai.status() == AiStatus::Aggro && !strike_first {
            if let Some(command) =
                self.pathing
                    .chase(zone, id, target, approach_reduce, approach_distance)
            {
                ai.queue_command(command, false);
            }
            return;
        }

        if rng.chance(wait_chance) {
            let seconds = rng.range_inclusive(COMBAT_WAIT_SECONDS.0, COMBAT_WAIT_SECONDS.1);
            ai.queue_command(AiCommand::wait_seconds(seconds as u32), false);
            return;
        }

        if distance > approach_distance {
            if let Some(command) =
                self.pathing
                    .chase(zone, id, target, approach_reduce, approach_distance)
            {
                ai.queue_command(command, false);
                return;
            }
        }

        match self.skills.select_skill(zone, id, ai, rng, now) {
            Some(choice) => {
                if let Some(range) = choice.approach {
                    if let Some(command) = self.pathing.chase(
                        zone,
                        id,
                        target,
                        range * SKILL_APPROACH_SHARE,
                        range,
                    ) {
                        ai.queue_command(command, false);
                    }
                }
                ai.queue_command(AiCommand::use_skill(choice.skill_id, choice.target), false);
            }
            None => {
                if let Some(command) = self.pathing.circle(zone, id, target, circle_distance, rng) {
                    ai.queue_command(command, false);
                }
                ai.queue_command(AiCommand::wait_seconds(1), false);
            }
        }
    }

    // ============================================================================
    // Command execution
    // ============================================================================

    /// Run one step of the head command; returns whether motion changed
    fn process_command(
        &self,
        zone: &mut Zone,
        id: EntityId,
        ai: &mut AiState,
        rng: &mut dyn RandomSource,
        now: u64,
    ) -> bool {
        let Some(command) = ai.current_command_mut() else {
            return false;
        };

        if !command.is_started() {
            command.start(now);
            if command.delay() > 0 {
                let until = now + command.delay();
                if let Some(mut combatant) = zone.get_mut::<Combatant>(id) {
                    combatant.set_status_time(StatusTimer::Waiting, until);
                }
                return false;
            }
        }

        let command_id = command.id();
        match command.kind().clone() {
            CommandKind::Wait => {
                ai.pop_command(Some(command_id));
                false
            }
            CommandKind::Move {
                target,
                min_dist,
                max_dist,
                ..
            } => {
                let band = match (target, min_dist, max_dist) {
                    (Some(target), Some(min), Some(max)) => Some((target, min, max)),
                    _ => None,
                };
                self.process_move(zone, id, ai, command_id, band, now)
            }
            CommandKind::UseSkill {
                skill_id,
                activation_id,
                target,
            } => {
                self.process_skill(zone, id, ai, command_id, skill_id, activation_id, target, now);
                false
            }
            CommandKind::Scripted { hook } => {
                let mut context = HookContext {
                    zone: &mut *zone,
                    entity: id,
                    ai: &mut *ai,
                    rng: &mut *rng,
                    now,
                    action: SCRIPT_ACTION,
                    candidates: &[],
                    selected: None,
                };
                match self.hooks.call(&hook, &mut context) {
                    HookResult::Error => {
                        ai.pop_command(Some(command_id));
                        false
                    }
                    HookResult::Pending => false,
                    HookResult::Done => {
                        ai.pop_command(Some(command_id));
                        zone.event_bus()
                            .publish(GameEvent::ScriptCompleted { entity: id, hook });
                        true
                    }
                }
            }
        }
    }

    fn process_move(
        &self,
        zone: &mut Zone,
        id: EntityId,
        ai: &mut AiState,
        command_id: CommandId,
        band: Option<(EntityId, f32, f32)>,
        now: u64,
    ) -> bool {
        let can_move = zone.get::<Combatant>(id).is_some_and(|c| c.can_move());
        if !can_move {
            tracing::trace!("{} cannot move, dropping its commands", id);
            ai.clear_commands();
            return false;
        }

        if let Some((target, min, max)) = band {
            let Some(target_position) = zone
                .active_entity(target)
                .and_then(|_| zone.position(target))
            else {
                ai.pop_command(Some(command_id));
                return false;
            };

            // An emptied path means the last leg is under way
            let end = ai
                .current_command()
                .and_then(|c| c.end_destination())
                .or_else(|| zone.get::<Motion>(id).map(|m| m.destination));
            let in_band = end.is_some_and(|end| {
                PathingSystem::in_band(end.distance(target_position), min, max)
            });
            if !in_band {
                ai.pop_command(Some(command_id));
                if let Some(command) = self.pathing.chase(zone, id, target, min, max) {
                    ai.push_front_command(command);
                }
                return false;
            }
        }

        let Some(current) = zone.get::<Motion>(id).map(|m| (m.current, m.is_moving())) else {
            return false;
        };
        let (position, moving) = current;
        if moving {
            return false;
        }

        let next = match ai.current_command_mut().map(AiCommand::kind_mut) {
            Some(CommandKind::Move { path, .. }) => {
                while path.front() == Some(&position) {
                    path.pop_front();
                }
                path.pop_front()
            }
            _ => None,
        };

        let Some(next) = next else {
            ai.pop_command(Some(command_id));
            return false;
        };
        let started = zone
            .get_mut::<Motion>(id)
            .is_some_and(|mut motion| motion.move_to(next, now));
        if !started {
            ai.pop_command(Some(command_id));
        }
        started
    }

    #[allow(clippy::too_many_arguments)]
    fn process_skill(
        &self,
        zone: &mut Zone,
        id: EntityId,
        ai: &mut AiState,
        command_id: CommandId,
        skill_id: SkillId,
        activation_id: Option<u32>,
        target: Option<EntityId>,
        now: u64,
    ) {
        let stunned = zone.get::<Combatant>(id).is_none_or(|c| {
            c.status_time(StatusTimer::HitStun).is_some()
                || c.status_time(StatusTimer::Knockback).is_some()
        });
        if stunned {
            return;
        }

        let Some(activation_id) = activation_id else {
            match self.abilities.activate(zone, id, skill_id, target, now) {
                Ok(activated) => {
                    if let Some(CommandKind::UseSkill { activation_id, .. }) =
                        ai.current_command_mut().map(AiCommand::kind_mut)
                    {
                        *activation_id = Some(activated.activation_id);
                    }
                }
                Err(e) if e.is_transient() => self.retry_or_drop(zone, id, ai, command_id, None),
                Err(e) => {
                    tracing::debug!("{} could not activate skill {}: {}", id, skill_id, e);
                    ai.pop_command(Some(command_id));
                }
            }
            return;
        };

        let activated = zone
            .get::<Combatant>(id)
            .and_then(|c| c.activated.clone())
            .filter(|a| a.activation_id == activation_id);
        let Some(activated) = activated else {
            ai.pop_command(Some(command_id));
            return;
        };

        let needs_enemy = self
            .skills
            .catalog()
            .get(activated.skill_id)
            .is_some_and(|s| s.targets_enemy());
        let target_valid = activated
            .target
            .is_some_and(|t| zone.active_entity(t).is_some() && zone.is_alive(t));
        if needs_enemy && !target_valid {
            tracing::debug!("{} lost the target of skill {}", id, activated.skill_id);
            self.abilities.cancel(zone, id, activation_id);
            ai.pop_command(Some(command_id));
            return;
        }

        if !activated.is_charged(now) {
            return;
        }

        match self.abilities.execute(zone, id, activation_id, now) {
            Ok(()) => {
                ai.pop_command(Some(command_id));
                if self.config.combat_stagger {
                    let stagger = ai.logic_group().stagger_ms * 1_000;
                    ai.push_front_command(AiCommand::wait(stagger));
                }
            }
            Err(e) if e.is_transient() => {
                self.retry_or_drop(zone, id, ai, command_id, Some(activation_id))
            }
            Err(e) => {
                tracing::debug!("{} failed to execute skill {}: {}", id, activated.skill_id, e);
                self.abilities.cancel(zone, id, activation_id);
                ai.pop_command(Some(command_id));
            }
        }
    }

    fn retry_or_drop(
        &self,
        zone: &mut Zone,
        id: EntityId,
        ai: &mut AiState,
        command_id: CommandId,
        activation_id: Option<u32>,
    ) {
        let max = ai.logic_group().max_command_retries;
        let retries = ai
            .current_command_mut()
            .map_or(u8::MAX, |c| c.record_retry());
        if retries <= max {
            return;
        }

        tracing::debug!("{} gave up on command {} after {} tries", id, command_id, retries);
        if let Some(activation_id) = activation_id {
            self.abilities.cancel(zone, id, activation_id);
        }
        ai.pop_command(Some(command_id));
    }

    // ============================================================================
    // External commands and notifications
    // ============================================================================

    fn with_ai<R>(
        &self,
        zone: &mut Zone,
        id: EntityId,
        f: impl FnOnce(&mut Zone, &mut AiState) -> R,
    ) -> Option<R> {
        let mut ai = zone.take_ai(id)?;
        let result = f(zone, &mut ai);
        zone.restore_ai(id, ai);
        Some(result)
    }

    /// Queue a move to a point
    pub fn queue_move(&self, zone: &mut Zone, id: EntityId, dest: Point, interrupt: bool) -> bool {
        self.with_ai(zone, id, |zone, ai| {
            match self.pathing.move_to_point(zone, id, dest) {
                Some(command) => {
                    ai.queue_command(command, interrupt);
                    true
                }
                None => false,
            }
        })
        .unwrap_or(false)
    }

    /// Queue a skill use
    pub fn queue_use_skill(
        &self,
        zone: &mut Zone,
        id: EntityId,
        skill_id: SkillId,
        target: Option<EntityId>,
        interrupt: bool,
    ) -> bool {
        self.with_ai(zone, id, |_, ai| {
            ai.queue_command(AiCommand::use_skill(skill_id, target), interrupt);
        })
        .is_some()
    }

    /// Queue a pause of whole seconds
    pub fn queue_wait_command(
        &self,
        zone: &mut Zone,
        id: EntityId,
        seconds: u32,
        interrupt: bool,
    ) -> bool {
        self.with_ai(zone, id, |_, ai| {
            ai.queue_command(AiCommand::wait_seconds(seconds), interrupt);
        })
        .is_some()
    }

    /// Queue a named hook to run until it reports completion
    pub fn queue_script_command(
        &self,
        zone: &mut Zone,
        id: EntityId,
        hook: &str,
        interrupt: bool,
    ) -> bool {
        if !self.hooks.contains(hook) {
            tracing::warn!("{} cannot queue unknown hook '{}'", id, hook);
            return false;
        }
        self.with_ai(zone, id, |_, ai| {
            ai.queue_command(AiCommand::scripted(hook), interrupt);
        })
        .is_some()
    }

    pub fn clear_commands(&self, zone: &mut Zone, id: EntityId) -> bool {
        self.with_ai(zone, id, |_, ai| ai.clear_commands()).is_some()
    }

    /// Have an entity follow another, or stop following with `None`
    pub fn set_follow_target(&self, zone: &mut Zone, id: EntityId, leader: Option<EntityId>) -> bool {
        self.with_ai(zone, id, |_, ai| ai.set_follow_target(leader))
            .is_some()
    }

    /// Record that `source` hit each of `targets` with a skill
    ///
    /// AI controlled targets without a target of their own turn on the
    /// attacker, and everyone hit is now in combat.
    pub fn notify_combat_hit(
        &self,
        zone: &mut Zone,
        targets: &[EntityId],
        source: EntityId,
        skill_id: SkillId,
    ) {
        for target in targets.iter().copied().filter(|t| *t != source) {
            zone.add_opponents(target, source);
            self.with_ai(zone, target, |zone, ai| {
                if ai.target().is_none() && zone.active_entity(source).is_some() {
                    self.targeting
                        .update_aggro(zone, target, ai, self.abilities.as_ref(), Some(source));
                }
                if ai.target().is_some() {
                    Self::transition(ai, AiStatus::Combat);
                }
            });
            tracing::trace!("{} hit {} with skill {}", source, target, skill_id);
        }
    }

    /// A skill used by `id` finished resolving
    pub fn notify_combat_resolved(
        &self,
        zone: &mut Zone,
        id: EntityId,
        activation_id: u32,
        skill_id: SkillId,
        target: Option<EntityId>,
        hit: bool,
    ) {
        self.with_ai(zone, id, |_, ai| {
            let resolved = ai.current_command().is_some_and(|command| {
                matches!(
                    command.kind(),
                    CommandKind::UseSkill { skill_id: s, activation_id: a, .. }
                        if *s == skill_id && a.is_none_or(|a| a == activation_id)
                )
            });
            if resolved {
                ai.pop_command(None);
                if self.config.combat_stagger {
                    let stagger = ai.logic_group().stagger_ms * 1_000;
                    ai.push_front_command(AiCommand::wait(stagger));
                }
            }

            if hit && target.is_some() && ai.status() == AiStatus::Aggro {
                Self::transition(ai, AiStatus::Combat);
            }
        });
    }

    /// Drop the cached skill roles after an entity's skills changed
    pub fn notify_skills_changed(&self, zone: &mut Zone, id: EntityId) {
        self.with_ai(zone, id, |_, ai| ai.invalidate_skill_map());
    }

    /// Queue a move away from `threat`
    ///
    /// Uses the logic group's retreat distance unless one is given.
    pub fn retreat(
        &self,
        zone: &mut Zone,
        id: EntityId,
        threat: EntityId,
        distance: Option<f32>,
    ) -> bool {
        let Some(threat_position) = zone.position(threat) else {
            return false;
        };
        self.with_ai(zone, id, |zone, ai| {
            let distance = distance.unwrap_or(ai.logic_group().retreat_distance);
            match self.pathing.retreat(zone, id, threat_position, distance) {
                Some(command) => {
                    ai.queue_command(command, false);
                    true
                }
                None => false,
            }
        })
        .unwrap_or(false)
    }

    /// Queue a move to within `[min_dist, max_dist]` of a target
    pub fn chase(
        &self,
        zone: &mut Zone,
        id: EntityId,
        target: EntityId,
        min_dist: f32,
        max_dist: f32,
    ) -> bool {
        self.with_ai(zone, id, |zone, ai| {
            match self.pathing.chase(zone, id, target, min_dist, max_dist) {
                Some(command) => {
                    ai.queue_command(command, false);
                    true
                }
                None => false,
            }
        })
        .unwrap_or(false)
    }

    /// Queue a sidestep around `pivot`
    pub fn circle(
        &self,
        zone: &mut Zone,
        id: EntityId,
        pivot: EntityId,
        rng: &mut dyn RandomSource,
    ) -> bool {
        self.with_ai(zone, id, |zone, ai| {
            let distance = ai.logic_group().circle_distance;
            match self.pathing.circle(zone, id, pivot, distance, rng) {
                Some(command) => {
                    ai.queue_command(command, false);
                    true
                }
                None => false,
            }
        })
        .unwrap_or(false)
    }

    /// Instantly relocate an entity, dropping whatever it was doing
    pub fn warp(
        &self,
        zone: &mut Zone,
        id: EntityId,
        position: Point,
        rotation: f32,
        now: u64,
    ) -> bool {
        let warped = zone.get_mut::<Motion>(id).map(|mut motion| {
            motion.warp(position, rotation, now);
        });
        if warped.is_none() {
            return false;
        }

        self.with_ai(zone, id, |_, ai| ai.clear_commands());
        zone.event_bus().publish(GameEvent::EntityWarped {
            entity: id,
            position,
            rotation,
        });
        true
    }

    /// Start moving straight to a point, ignoring the command queue
    pub fn move_to(&self, zone: &mut Zone, id: EntityId, position: Point, now: u64) -> bool {
        if !zone.get::<Combatant>(id).is_some_and(|c| c.can_move()) {
            return false;
        }
        zone.get_mut::<Motion>(id)
            .is_some_and(|mut motion| motion.move_to(position, now))
    }
}

impl std::fmt::Debug for AiManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut groups: Vec<&String> = self.logic_groups.keys().collect();
        groups.sort();
        f.debug_struct("AiManager")
            .field("config", &self.config)
            .field("logic_groups", &groups)
            .field("behaviors", &self.behaviors.len())
            .field("hooks", &self.hooks)
            .finish()
    }
}
