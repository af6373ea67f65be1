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
//! Test utilities for ECS testing

use crate::config::EngineConfig;
use crate::ecs::abilities::BasicAbilityService;
use crate::ecs::actor_builder::ActorBuilder;
use crate::ecs::components::{
    Combatant, EntityId, EntityKind, Point, SkillCatalog, SkillDefinition, SkillFormula,
    TargetType,
};
use crate::ecs::systems::AiManager;
use crate::ecs::zone::Zone;
use std::sync::Arc;

/// Faction shared by test monsters
pub const MONSTER_FACTION: i32 = 2;

/// Faction shared by test players
pub const PLAYER_FACTION: i32 = 1;

/// Skill catalog with one melee and one ranged attack
pub fn test_catalog() -> Arc<SkillCatalog> {
    Arc::new(
        [
            SkillDefinition::new(1, "Bite", TargetType::Enemy, SkillFormula::Damage)
                .with_range(150.0),
            SkillDefinition::new(2, "Spit", TargetType::Enemy, SkillFormula::Damage)
                .with_charge(500),
        ]
        .into_iter()
        .collect(),
    )
}

/// Manager using the test catalog and default engine switches
pub fn test_manager() -> AiManager {
    let catalog = test_catalog();
    AiManager::new(
        EngineConfig::default(),
        catalog.clone(),
        Arc::new(BasicAbilityService::new(catalog)),
    )
}

/// Spawn an enemy knowing every test skill
pub fn spawn_monster(zone: &mut Zone, name: &str, at: Point) -> EntityId {
    zone.spawn(
        ActorBuilder::new(name, EntityKind::Enemy)
            .at(at)
            .with_combatant(Combatant::new(MONSTER_FACTION, 100, 20).with_skills([1, 2])),
    )
    .expect("spawn monster")
}

/// Spawn a player character
pub fn spawn_player(zone: &mut Zone, name: &str, at: Point) -> EntityId {
    zone.spawn(
        ActorBuilder::new(name, EntityKind::Character)
            .at(at)
            .with_combatant(Combatant::new(PLAYER_FACTION, 100, 0)),
    )
    .expect("spawn player")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fixtures() {
        let mut zone = Zone::new(1, "Test");
        let monster = spawn_monster(&mut zone, "Slime", Point::new(0.0, 0.0));
        let player = spawn_player(&mut zone, "Hero", Point::new(10.0, 0.0));

        assert_eq!(zone.len(), 2);
        assert_eq!(zone.kind(monster), Some(EntityKind::Enemy));
        assert_ne!(zone.faction_group(monster), zone.faction_group(player));
        assert_eq!(test_manager().skills().catalog().len(), 2);
    }
}
