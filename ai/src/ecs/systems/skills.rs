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
//! Ability selection for AI controlled entities
//!
//! Known skills are sorted once into tactical roles and cached on the AI
//! state. Each decision then narrows the cached map down to what the entity
//! can use right now and makes a weighted random pick.

use crate::ecs::components::{
    AiState, Combatant, EntityId, SkillCatalog, SkillDefinition, SkillFormula, SkillId, SkillMap,
    SkillRole, TargetType, WeightedSkill,
};
use crate::ecs::zone::Zone;
use crate::random::RandomSource;
use std::sync::Arc;

/// A skill picked for use
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SkillChoice {
    pub skill_id: SkillId,
    pub role: SkillRole,
    pub target: Option<EntityId>,
    /// Range the entity has to close to before the skill can be used
    pub approach: Option<f32>,
}

/// Skill role mapping and weighted selection
#[derive(Debug, Clone)]
pub struct SkillSystem {
    catalog: Arc<SkillCatalog>,
}

impl SkillSystem {
    pub fn new(catalog: Arc<SkillCatalog>) -> Self {
        Self { catalog }
    }

    pub fn catalog(&self) -> &SkillCatalog {
        &self.catalog
    }

    /// Whether the engine knows how to use a skill at all
    pub fn is_supported(skill: &SkillDefinition) -> bool {
        skill.active
            && skill.function_id.is_none()
            && skill.cost.item.is_none()
            && skill.ai_weight > 0
    }

    /// Tactical role a skill fills, if it is usable by this kind of entity
    pub fn classify(skill: &SkillDefinition, is_enemy: bool) -> Option<SkillRole> {
        if !Self::is_supported(skill) {
            return None;
        }

        match skill.target_type {
            TargetType::Object => return None,
            TargetType::Party | TargetType::DeadAlly | TargetType::DeadParty if is_enemy => {
                return None;
            }
            _ => {}
        }

        Some(match (skill.formula, skill.target_type) {
            (SkillFormula::Damage, TargetType::Enemy) if skill.is_range_limited() => {
                SkillRole::CloseRange
            }
            (SkillFormula::Damage, TargetType::Enemy) => SkillRole::LongRange,
            (SkillFormula::Heal, _) => SkillRole::Heal,
            (_, TargetType::Source) => SkillRole::Defense,
            _ => SkillRole::Support,
        })
    }

    /// Sort an entity's known skills into roles
    pub fn build_skill_map(&self, combatant: &Combatant, is_enemy: bool) -> SkillMap {
        let mut map = SkillMap::new();
        for skill_id in &combatant.skills {
            let Some(skill) = self.catalog.get(*skill_id) else {
                tracing::trace!("Skipping unknown skill {}", skill_id);
                continue;
            };
            if let Some(role) = Self::classify(skill, is_enemy) {
                map.entry(role).or_default().push(WeightedSkill {
                    skill_id: skill.id,
                    weight: skill.ai_weight,
                });
            }
        }
        map
    }

    /// Build the skill map if it is missing
    pub fn refresh_skill_map(&self, zone: &Zone, id: EntityId, ai: &mut AiState) {
        if ai.skill_map().is_some() {
            return;
        }
        let is_enemy = zone.kind(id).is_some_and(|kind| kind.is_hostile());
        let map = zone
            .get::<Combatant>(id)
            .map(|combatant| self.build_skill_map(&combatant, is_enemy))
            .unwrap_or_default();
        ai.set_skill_map(map);
    }

    /// Roles the entity may draw from right now
    fn eligible_roles(ai: &AiState, combatant: &Combatant) -> Vec<SkillRole> {
        let group = ai.logic_group();
        SkillRole::ALL
            .into_iter()
            .filter(|role| match role {
                SkillRole::Defense | SkillRole::Support => true,
                SkillRole::Heal => combatant.hp_fraction() < group.heal_threshold,
                SkillRole::CloseRange | SkillRole::LongRange => {
                    group.strike_first || combatant.in_combat()
                }
            })
            .collect()
    }

    /// Whether a skill can be used by `combatant` on the current target now
    fn is_usable(
        &self,
        zone: &Zone,
        combatant: &Combatant,
        target: Option<EntityId>,
        skill_id: SkillId,
        now: u64,
    ) -> bool {
        let Some(skill) = self.catalog.get(skill_id) else {
            return false;
        };
        if !combatant.skills.contains(&skill_id)
            || combatant.locked_skills.contains(&skill_id)
            || !combatant.cooldown_ready(skill_id, now)
        {
            return false;
        }
        if combatant.hp <= skill.cost.hp || combatant.mp < skill.cost.mp {
            return false;
        }
        if skill.targets_enemy() {
            return target.is_some_and(|t| zone.active_entity(t).is_some() && zone.is_alive(t));
        }
        true
    }

    /// Cumulative weight draw over `[1, total]`
    fn weighted_pick<T: Copy>(
        items: &[(T, u16)],
        rng: &mut dyn RandomSource,
    ) -> Option<T> {
        let total: i64 = items.iter().map(|(_, w)| *w as i64).sum();
        if total <= 0 {
            return None;
        }

        let roll = rng.range_inclusive(1, total);
        let mut running = 0;
        for (item, weight) in items {
            running += *weight as i64;
            if running >= roll {
                return Some(*item);
            }
        }
        None
    }

    /// Pick a skill for the entity to use next
    pub fn select_skill(
        &self,
        zone: &Zone,
        id: EntityId,
        ai: &mut AiState,
        rng: &mut dyn RandomSource,
        now: u64,
    ) -> Option<SkillChoice> {
        self.refresh_skill_map(zone, id, ai);

        let combatant = zone.combatant(id)?;
        let target = ai.target();
        let map = ai.skill_map()?;

        let mut usable: Vec<(SkillRole, Vec<(WeightedSkill, u16)>)> = Vec::new();
        for role in Self::eligible_roles(ai, &combatant) {
            let skills: Vec<(WeightedSkill, u16)> = map
                .get(&role)
                .into_iter()
                .flatten()
                .filter(|ws| self.is_usable(zone, &combatant, target, ws.skill_id, now))
                .map(|ws| (*ws, ws.weight))
                .collect();
            if !skills.is_empty() {
                usable.push((role, skills));
            }
        }

        let weights = ai.logic_group().action_weights;
        let (role, picked) = if weights.is_enabled() {
            let roles: Vec<(SkillRole, u16)> = usable
                .iter()
                .map(|(role, _)| (*role, weights.weight(*role)))
                .collect();
            let role = Self::weighted_pick(&roles, rng)?;
            let skills = usable.iter().find(|(r, _)| *r == role).map(|(_, s)| s)?;
            (role, Self::weighted_pick(skills, rng)?)
        } else {
            let flat: Vec<((SkillRole, WeightedSkill), u16)> = usable
                .iter()
                .flat_map(|(role, skills)| skills.iter().map(move |(ws, w)| ((*role, *ws), *w)))
                .collect();
            Self::weighted_pick(&flat, rng)?
        };

        let skill = self.catalog.get(picked.skill_id)?;
        let (target, approach) = if skill.targets_enemy() {
            let approach = match (zone.position(id), target.and_then(|t| zone.position(t))) {
                (Some(source), Some(dest))
                    if skill.is_range_limited() && source.distance(dest) > skill.range =>
                {
                    Some(skill.range)
                }
                _ => None,
            };
            (target, approach)
        } else {
            (Some(id), None)
        };

        tracing::trace!("{} selected skill {} as {}", id, skill.id, role.as_str());
        Some(SkillChoice {
            skill_id: skill.id,
            role,
            target,
            approach,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ecs::actor_builder::ActorBuilder;
    use crate::ecs::components::{ActionWeights, EntityKind, LogicGroup, Point};
    use crate::random::{SequenceRandom, seeded};

    fn catalog() -> Arc<SkillCatalog> {
        Arc::new(
            [
                SkillDefinition::new(1, "Claw", TargetType::Enemy, SkillFormula::Damage)
                    .with_range(200.0),
                SkillDefinition::new(2, "Zio", TargetType::Enemy, SkillFormula::Damage),
                SkillDefinition::new(3, "Dia", TargetType::Ally, SkillFormula::Heal),
                SkillDefinition::new(4, "Rakukaja", TargetType::Ally, SkillFormula::Utility),
                SkillDefinition::new(5, "Guard", TargetType::Source, SkillFormula::Utility),
                SkillDefinition::new(6, "Recarm", TargetType::DeadAlly, SkillFormula::Heal),
                SkillDefinition::new(7, "Passive", TargetType::Source, SkillFormula::Utility)
                    .passive(),
                SkillDefinition::new(8, "Summon", TargetType::Enemy, SkillFormula::Damage)
                    .with_function(12),
                SkillDefinition::new(9, "Gem", TargetType::Enemy, SkillFormula::Damage)
                    .with_item_cost(100),
                SkillDefinition::new(10, "Never", TargetType::Enemy, SkillFormula::Damage)
                    .with_weight(0),
            ]
            .into_iter()
            .collect(),
        )
    }

    fn setup(skills: &[SkillId], group: LogicGroup) -> (Zone, EntityId, EntityId, AiState) {
        let mut zone = Zone::new(1, "Test");
        let wolf = zone
            .spawn(
                ActorBuilder::new("Wolf", EntityKind::Enemy).with_combatant(
                    Combatant::new(2, 100, 50).with_skills(skills.iter().copied()),
                ),
            )
            .unwrap();
        let hero = zone
            .spawn(
                ActorBuilder::new("Hero", EntityKind::Character)
                    .at(Point::new(100.0, 0.0))
                    .with_combatant(Combatant::new(1, 100, 0)),
            )
            .unwrap();
        let mut ai = AiState::new(Arc::new(group));
        ai.set_target(Some(hero));
        (zone, wolf, hero, ai)
    }

    #[test]
    fn test_classify_roles() {
        let system = SkillSystem::new(catalog());
        let role = |id: SkillId, enemy: bool| {
            SkillSystem::classify(system.catalog().get(id).unwrap(), enemy)
        };

        assert_eq!(role(1, true), Some(SkillRole::CloseRange));
        assert_eq!(role(2, true), Some(SkillRole::LongRange));
        assert_eq!(role(3, true), Some(SkillRole::Heal));
        assert_eq!(role(4, true), Some(SkillRole::Support));
        assert_eq!(role(5, true), Some(SkillRole::Defense));
        assert_eq!(role(6, true), None);
        assert_eq!(role(6, false), Some(SkillRole::Heal));
        assert_eq!(role(7, true), None);
        assert_eq!(role(8, true), None);
        assert_eq!(role(9, true), None);
        assert_eq!(role(10, true), None);
    }

    #[test]
    fn test_build_skill_map_skips_unsupported() {
        let system = SkillSystem::new(catalog());
        let combatant = Combatant::new(2, 100, 0).with_skills([1, 2, 7, 8, 42]);
        let map = system.build_skill_map(&combatant, true);

        assert_eq!(map.len(), 2);
        assert_eq!(map[&SkillRole::CloseRange][0].skill_id, 1);
        assert_eq!(map[&SkillRole::LongRange][0].skill_id, 2);
    }

    #[test]
    fn test_heal_needs_low_health() {
        let system = SkillSystem::new(catalog());
        let (zone, wolf, _, mut ai) = setup(&[3], LogicGroup::default());
        let mut rng = seeded(1);

        assert!(system.select_skill(&zone, wolf, &mut ai, &mut rng, 0).is_none());

        zone.get_mut::<Combatant>(wolf).unwrap().hp = 10;
        let choice = system.select_skill(&zone, wolf, &mut ai, &mut rng, 0).unwrap();
        assert_eq!(choice.skill_id, 3);
        assert_eq!(choice.target, Some(wolf));
    }

    #[test]
    fn test_offense_needs_strike_first_or_combat() {
        let system = SkillSystem::new(catalog());
        let mut group = LogicGroup::default();
        group.strike_first = false;
        let (mut zone, wolf, hero, mut ai) = setup(&[2], group);
        let mut rng = seeded(1);

        assert!(system.select_skill(&zone, wolf, &mut ai, &mut rng, 0).is_none());

        zone.add_opponents(wolf, hero);
        let choice = system.select_skill(&zone, wolf, &mut ai, &mut rng, 0).unwrap();
        assert_eq!(choice.skill_id, 2);
        assert_eq!(choice.target, Some(hero));
        assert_eq!(choice.approach, None);
    }

    #[test]
    fn test_filters_cooldown_lock_and_cost() {
        let system = SkillSystem::new(catalog());
        let (zone, wolf, _, mut ai) = setup(&[2], LogicGroup::default());
        let mut rng = seeded(1);

        zone.get_mut::<Combatant>(wolf).unwrap().cooldowns.insert(2, 500);
        assert!(system.select_skill(&zone, wolf, &mut ai, &mut rng, 0).is_none());
        assert!(system.select_skill(&zone, wolf, &mut ai, &mut rng, 500).is_some());

        zone.get_mut::<Combatant>(wolf).unwrap().locked_skills.insert(2);
        assert!(system.select_skill(&zone, wolf, &mut ai, &mut rng, 500).is_none());
    }

    #[test]
    fn test_dead_target_invalidates_offense() {
        let system = SkillSystem::new(catalog());
        let (zone, wolf, hero, mut ai) = setup(&[2], LogicGroup::default());
        zone.get_mut::<Combatant>(hero).unwrap().hp = 0;

        let mut rng = seeded(1);
        assert!(system.select_skill(&zone, wolf, &mut ai, &mut rng, 0).is_none());
    }

    #[test]
    fn test_close_range_requires_approach() {
        let system = SkillSystem::new(catalog());
        let (zone, wolf, hero, mut ai) = setup(&[1], LogicGroup::default());
        zone.get_mut::<crate::ecs::components::Motion>(hero)
            .unwrap()
            .warp(Point::new(500.0, 0.0), 0.0, 0);

        let mut rng = seeded(1);
        let choice = system.select_skill(&zone, wolf, &mut ai, &mut rng, 0).unwrap();
        assert_eq!(choice.role, SkillRole::CloseRange);
        assert_eq!(choice.approach, Some(200.0));
    }

    #[test]
    fn test_role_weighting() {
        let system = SkillSystem::new(catalog());
        let mut group = LogicGroup::default();
        group.action_weights = ActionWeights {
            defense: 1,
            ..Default::default()
        };
        let (zone, wolf, _, mut ai) = setup(&[2, 5], group);

        let mut rng = seeded(9);
        for _ in 0..50 {
            let choice = system.select_skill(&zone, wolf, &mut ai, &mut rng, 0).unwrap();
            assert_eq!(choice.skill_id, 5);
        }
    }

    #[test]
    fn test_cumulative_draw_boundaries() {
        let items = [(1u32, 1u16), (2u32, 3u16)];
        assert_eq!(
            SkillSystem::weighted_pick(&items, &mut SequenceRandom::new([1])),
            Some(1)
        );
        assert_eq!(
            SkillSystem::weighted_pick(&items, &mut SequenceRandom::new([2])),
            Some(2)
        );
        assert_eq!(
            SkillSystem::weighted_pick(&items, &mut SequenceRandom::new([4])),
            Some(2)
        );
        assert_eq!(
            SkillSystem::weighted_pick::<u32>(&[], &mut SequenceRandom::new([1])),
            None
        );
    }
}
