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
//! Statistical and property tests for skill choice and wandering

use proptest::prelude::*;
use std::sync::Arc;
use wyldlands_ai::ecs::actor_builder::ActorBuilder;
use wyldlands_ai::ecs::components::*;
use wyldlands_ai::ecs::systems::{PathingSystem, SkillSystem};
use wyldlands_ai::ecs::zone::Zone;
use wyldlands_ai::random::seeded;

#[test]
fn test_skill_weights_shape_selection() {
    let catalog: Arc<SkillCatalog> = Arc::new(
        [
            SkillDefinition::new(1, "Harden", TargetType::Source, SkillFormula::Utility)
                .with_weight(1),
            SkillDefinition::new(2, "Brace", TargetType::Source, SkillFormula::Utility)
                .with_weight(3),
        ]
        .into_iter()
        .collect(),
    );
    let skills = SkillSystem::new(catalog);

    let mut zone = Zone::new(1, "Arena");
    let golem = zone
        .spawn(
            ActorBuilder::new("Golem", EntityKind::Enemy)
                .with_combatant(Combatant::new(2, 100, 0).with_skills([1, 2])),
        )
        .unwrap();
    let mut ai = AiState::new(Arc::new(LogicGroup::new("golem")));

    let mut rng = seeded(2024);
    let trials = 10_000;
    let mut counts = [0u32; 2];
    for _ in 0..trials {
        let choice = skills.select_skill(&zone, golem, &mut ai, &mut rng, 0).unwrap();
        assert_eq!(choice.role, SkillRole::Defense);
        assert_eq!(choice.target, Some(golem));
        counts[(choice.skill_id - 1) as usize] += 1;
    }

    let share = counts[1] as f64 / trials as f64;
    assert!((share - 0.75).abs() < 0.03, "Brace share was {}", share);
}

fn spot_zone(center: Point, width: f32, height: f32) -> (Zone, EntityId) {
    let region = SpawnRegion::Spot {
        center,
        width,
        height,
    };
    let mut zone = Zone::new(1, "Glade");
    let deer = zone
        .spawn(
            ActorBuilder::new("Deer", EntityKind::Enemy)
                .at(center)
                .with_speed(10_000.0)
                .with_origin(SpawnOrigin::new().with_spot(region)),
        )
        .unwrap();
    (zone, deer)
}

proptest! {
    #[test]
    fn test_wander_stays_in_spot(
        seed in any::<u64>(),
        x in -1000.0f32..1000.0,
        y in -1000.0f32..1000.0,
        width in 10.0f32..500.0,
        height in 10.0f32..500.0,
    ) {
        let (zone, deer) = spot_zone(Point::new(x, y), width, height);
        let ai = AiState::new(Arc::new(LogicGroup::new("deer")));
        let pathing = PathingSystem::new(true);

        let command = pathing.wander(&zone, deer, &ai, &mut seeded(seed));
        if let Some(command) = command {
            let end = command.end_destination().unwrap();
            prop_assert!((end.x - x).abs() <= width / 2.0 + 0.01);
            prop_assert!((end.y - y).abs() <= height / 2.0 + 0.01);
        }
    }

    #[test]
    fn test_wander_travel_is_capped(
        seed in any::<u64>(),
        speed in 10.0f32..400.0,
        wander_distance in 50.0f32..2000.0,
        rotation in -3.14f32..3.14,
    ) {
        let mut zone = Zone::new(1, "Steppe");
        let horse = zone
            .spawn(
                ActorBuilder::new("Horse", EntityKind::Ally)
                    .facing(rotation)
                    .with_speed(speed),
            )
            .unwrap();
        let mut group = LogicGroup::new("horse");
        group.wander_distance = wander_distance;
        let ai = AiState::new(Arc::new(group));

        let command = PathingSystem::new(true).wander(&zone, horse, &ai, &mut seeded(seed));
        if let Some(command) = command {
            let end = command.end_destination().unwrap();
            prop_assert!(end.distance(Point::new(0.0, 0.0)) <= speed * 2.0 + 0.1);
        }
    }
}
