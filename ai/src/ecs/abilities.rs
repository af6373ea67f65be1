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
//! Ability service: how AI controlled entities activate and execute skills
//!
//! Damage and effect math belong to the combat server. The AI engine only
//! needs to start an ability, finish it once charged, cancel it, and tell
//! the service when an in-flight ability should follow a new target.
//! [`BasicAbilityService`] is a simple implementation used by the headless
//! server and in tests.

use crate::ecs::components::{
    ActivatedAbility, Combatant, EntityId, SkillCatalog, SkillDefinition, SkillFormula, SkillId,
};
use crate::ecs::zone::Zone;
use crate::error::AbilityError;
use std::sync::Arc;
use std::sync::atomic::{AtomicU32, Ordering};

/// Amount of HP a basic damage or heal skill moves, as a share of the
/// target's maximum HP
const BASIC_EFFECT_SHARE: f32 = 0.1;

/// Collaborator that owns ability activation and resolution
pub trait AbilityService: Send + Sync {
    /// Begin activating a skill
    fn activate(
        &self,
        zone: &mut Zone,
        source: EntityId,
        skill_id: SkillId,
        target: Option<EntityId>,
        now: u64,
    ) -> Result<ActivatedAbility, AbilityError>;

    /// Resolve a charged activation
    fn execute(
        &self,
        zone: &mut Zone,
        source: EntityId,
        activation_id: u32,
        now: u64,
    ) -> Result<(), AbilityError>;

    /// Abandon an activation; returns false if it was not in flight
    fn cancel(&self, zone: &mut Zone, source: EntityId, activation_id: u32) -> bool;

    /// The source switched targets while an activation is in flight
    fn target_changed(&self, zone: &mut Zone, source: EntityId, target: Option<EntityId>);
}

/// Ability service that applies flat damage and healing
#[derive(Debug)]
pub struct BasicAbilityService {
    catalog: Arc<SkillCatalog>,
    next_activation: AtomicU32,
}

impl BasicAbilityService {
    pub fn new(catalog: Arc<SkillCatalog>) -> Self {
        Self {
            catalog,
            next_activation: AtomicU32::new(1),
        }
    }

    fn skill(&self, skill_id: SkillId) -> Result<&SkillDefinition, AbilityError> {
        self.catalog
            .get(skill_id)
            .ok_or_else(|| AbilityError::Invalid(format!("Unknown skill {}", skill_id)))
    }

    fn check_target(
        zone: &Zone,
        skill: &SkillDefinition,
        target: Option<EntityId>,
    ) -> Result<(), AbilityError> {
        if !skill.targets_enemy() {
            return Ok(());
        }
        match target {
            Some(id) if zone.active_entity(id).is_some() && zone.is_alive(id) => Ok(()),
            _ => Err(AbilityError::Invalid(format!(
                "Skill {} needs a living target",
                skill.id
            ))),
        }
    }

    fn check_source(
        source: &Combatant,
        skill: &SkillDefinition,
        now: u64,
    ) -> Result<(), AbilityError> {
        if !source.can_use_skills() {
            return Err(AbilityError::Busy);
        }
        if !source.skills.contains(&skill.id) || source.locked_skills.contains(&skill.id) {
            return Err(AbilityError::Invalid(format!("Skill {} is not usable", skill.id)));
        }
        if !source.cooldown_ready(skill.id, now) {
            return Err(AbilityError::Busy);
        }
        if source.hp <= skill.cost.hp || source.mp < skill.cost.mp {
            return Err(AbilityError::Invalid(format!(
                "Cannot pay for skill {}",
                skill.id
            )));
        }
        Ok(())
    }
}

impl AbilityService for BasicAbilityService {
    fn activate(
        &self,
        zone: &mut Zone,
        source: EntityId,
        skill_id: SkillId,
        target: Option<EntityId>,
        now: u64,
    ) -> Result<ActivatedAbility, AbilityError> {
        let skill = self.skill(skill_id)?;
        Self::check_target(zone, skill, target)?;

        let mut combatant = zone
            .get_mut::<Combatant>(source)
            .ok_or_else(|| AbilityError::Invalid(format!("Unknown source {}", source)))?;
        if combatant.activated.is_some() {
            return Err(AbilityError::Busy);
        }
        Self::check_source(&combatant, skill, now)?;

        let activated = ActivatedAbility {
            activation_id: self.next_activation.fetch_add(1, Ordering::Relaxed),
            skill_id,
            target,
            activation_time: now,
            charged_time: now + skill.charge_ms * 1_000,
        };
        combatant.activated = Some(activated.clone());

        tracing::trace!("{} activated skill {} on {:?}", source, skill_id, target);
        Ok(activated)
    }

    fn execute(
        &self,
        zone: &mut Zone,
        source: EntityId,
        activation_id: u32,
        now: u64,
    ) -> Result<(), AbilityError> {
        let activated = zone
            .get::<Combatant>(source)
            .and_then(|c| c.activated.clone())
            .filter(|a| a.activation_id == activation_id)
            .ok_or_else(|| {
                AbilityError::Invalid(format!("Activation {} is not in flight", activation_id))
            })?;
        if !activated.is_charged(now) {
            return Err(AbilityError::Busy);
        }

        let skill = self.skill(activated.skill_id)?.clone();
        if let Err(err) = Self::check_target(zone, &skill, activated.target) {
            self.cancel(zone, source, activation_id);
            return Err(err);
        }

        if let Some(mut combatant) = zone.get_mut::<Combatant>(source) {
            combatant.activated = None;
            combatant.hp -= skill.cost.hp;
            combatant.mp -= skill.cost.mp;
            if skill.cooldown_ms > 0 {
                combatant
                    .cooldowns
                    .insert(skill.id, now + skill.cooldown_ms * 1_000);
            }
        }

        let Some(target) = activated.target else {
            return Ok(());
        };
        if let Some(mut combatant) = zone.get_mut::<Combatant>(target) {
            let amount = ((combatant.max_hp as f32) * BASIC_EFFECT_SHARE).ceil() as i32;
            match skill.formula {
                SkillFormula::Damage => combatant.hp = (combatant.hp - amount).max(0),
                SkillFormula::Heal => combatant.hp = (combatant.hp + amount).min(combatant.max_hp),
                SkillFormula::Utility => {}
            }
        }
        if skill.formula == SkillFormula::Damage && target != source {
            zone.add_opponents(source, target);
        }

        tracing::trace!("{} executed skill {} on {}", source, skill.id, target);
        Ok(())
    }

    fn cancel(&self, zone: &mut Zone, source: EntityId, activation_id: u32) -> bool {
        let Some(mut combatant) = zone.get_mut::<Combatant>(source) else {
            return false;
        };
        match &combatant.activated {
            Some(activated) if activated.activation_id == activation_id => {
                combatant.activated = None;
                true
            }
            _ => false,
        }
    }

    fn target_changed(&self, zone: &mut Zone, source: EntityId, target: Option<EntityId>) {
        if let Some(mut combatant) = zone.get_mut::<Combatant>(source) {
            if let Some(activated) = combatant.activated.as_mut() {
                activated.target = target;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ecs::actor_builder::ActorBuilder;
    use crate::ecs::components::{EntityKind, Point, TargetType};

    fn setup() -> (Zone, BasicAbilityService, EntityId, EntityId) {
        let catalog: SkillCatalog = [
            SkillDefinition::new(1, "Bite", TargetType::Enemy, SkillFormula::Damage)
                .with_cost(0, 5)
                .with_cooldown(2_000)
                .with_charge(500),
            SkillDefinition::new(2, "Guard", TargetType::Source, SkillFormula::Utility),
        ]
        .into_iter()
        .collect();

        let mut zone = Zone::new(1, "Test");
        let wolf = zone
            .spawn(
                ActorBuilder::new("Wolf", EntityKind::Enemy)
                    .with_combatant(Combatant::new(2, 100, 20).with_skills([1, 2])),
            )
            .unwrap();
        let hero = zone
            .spawn(
                ActorBuilder::new("Hero", EntityKind::Character)
                    .at(Point::new(50.0, 0.0))
                    .with_combatant(Combatant::new(1, 100, 0)),
            )
            .unwrap();

        (zone, BasicAbilityService::new(Arc::new(catalog)), wolf, hero)
    }

    #[test]
    fn test_activate_and_execute() {
        let (mut zone, service, wolf, hero) = setup();

        let activated = service.activate(&mut zone, wolf, 1, Some(hero), 1_000).unwrap();
        assert_eq!(activated.charged_time, 501_000);
        assert_eq!(
            service.activate(&mut zone, wolf, 2, None, 1_000),
            Err(AbilityError::Busy)
        );

        assert_eq!(
            service.execute(&mut zone, wolf, activated.activation_id, 2_000),
            Err(AbilityError::Busy)
        );
        service
            .execute(&mut zone, wolf, activated.activation_id, 501_000)
            .unwrap();

        let wolf_state = zone.combatant(wolf).unwrap();
        assert!(wolf_state.activated.is_none());
        assert_eq!(wolf_state.mp, 15);
        assert!(!wolf_state.cooldown_ready(1, 501_000));
        assert!(wolf_state.opponents.contains(&hero));
        assert_eq!(zone.combatant(hero).unwrap().hp, 90);
    }

    #[test]
    fn test_dead_target_cancels() {
        let (mut zone, service, wolf, hero) = setup();

        let activated = service.activate(&mut zone, wolf, 1, Some(hero), 0).unwrap();
        zone.get_mut::<Combatant>(hero).unwrap().hp = 0;

        assert!(matches!(
            service.execute(&mut zone, wolf, activated.activation_id, 600_000),
            Err(AbilityError::Invalid(_))
        ));
        assert!(zone.combatant(wolf).unwrap().activated.is_none());
    }

    #[test]
    fn test_cancel_and_retarget() {
        let (mut zone, service, wolf, hero) = setup();

        let activated = service.activate(&mut zone, wolf, 1, Some(hero), 0).unwrap();
        service.target_changed(&mut zone, wolf, None);
        assert_eq!(
            zone.combatant(wolf).unwrap().activated.unwrap().target,
            None
        );

        assert!(!service.cancel(&mut zone, wolf, activated.activation_id + 1));
        assert!(service.cancel(&mut zone, wolf, activated.activation_id));
        assert!(zone.combatant(wolf).unwrap().activated.is_none());
    }

    #[test]
    fn test_cannot_pay() {
        let (mut zone, service, wolf, hero) = setup();
        zone.get_mut::<Combatant>(wolf).unwrap().mp = 1;

        assert!(matches!(
            service.activate(&mut zone, wolf, 1, Some(hero), 0),
            Err(AbilityError::Invalid(_))
        ));
    }
}
