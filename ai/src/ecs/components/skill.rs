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

//! Skill definitions consumed by ability selection

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Skill definition identifier
pub type SkillId = u32;

/// Tactical role a skill fills for AI controlled entities
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SkillRole {
    CloseRange,
    LongRange,
    Heal,
    Support,
    Defense,
}

impl SkillRole {
    pub const ALL: [SkillRole; 5] = [
        SkillRole::CloseRange,
        SkillRole::LongRange,
        SkillRole::Heal,
        SkillRole::Support,
        SkillRole::Defense,
    ];

    /// Roles that strike an opponent
    pub fn is_offensive(&self) -> bool {
        matches!(self, SkillRole::CloseRange | SkillRole::LongRange)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            SkillRole::CloseRange => "close_range",
            SkillRole::LongRange => "long_range",
            SkillRole::Heal => "heal",
            SkillRole::Support => "support",
            SkillRole::Defense => "defense",
        }
    }
}

/// Who a skill may be used on
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TargetType {
    Ally,
    Source,
    Enemy,
    Party,
    DeadAlly,
    DeadParty,
    Object,
}

/// How a skill affects its target
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SkillFormula {
    Damage,
    Heal,
    Utility,
}

/// Resources consumed on use
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SkillCost {
    pub hp: i32,
    pub mp: i32,
    /// Item consumed per use
    pub item: Option<u32>,
}

/// A skill known to the zone
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SkillDefinition {
    pub id: SkillId,
    pub name: String,
    /// Passive skills are never selected
    #[serde(default = "SkillDefinition::default_active")]
    pub active: bool,
    pub target_type: TargetType,
    pub formula: SkillFormula,
    /// Maximum distance to the target when the skill executes; 0 means the
    /// skill reaches any target in sight
    #[serde(default)]
    pub range: f32,
    #[serde(default)]
    pub cost: SkillCost,
    #[serde(default)]
    pub cooldown_ms: u64,
    #[serde(default)]
    pub charge_ms: u64,
    /// Special function handled by dedicated server logic
    #[serde(default)]
    pub function_id: Option<u16>,
    /// Relative chance of being picked within its role
    #[serde(default = "SkillDefinition::default_weight")]
    pub ai_weight: u16,
}

impl SkillDefinition {
    fn default_active() -> bool {
        true
    }

    fn default_weight() -> u16 {
        1
    }

    /// Create an active skill with default costs and timings
    pub fn new(
        id: SkillId,
        name: impl Into<String>,
        target_type: TargetType,
        formula: SkillFormula,
    ) -> Self {
        Self {
            id,
            name: name.into(),
            active: true,
            target_type,
            formula,
            range: 0.0,
            cost: SkillCost::default(),
            cooldown_ms: 0,
            charge_ms: 0,
            function_id: None,
            ai_weight: 1,
        }
    }

    pub fn with_range(mut self, range: f32) -> Self {
        self.range = range;
        self
    }

    pub fn with_cost(mut self, hp: i32, mp: i32) -> Self {
        self.cost.hp = hp;
        self.cost.mp = mp;
        self
    }

    pub fn with_item_cost(mut self, item: u32) -> Self {
        self.cost.item = Some(item);
        self
    }

    pub fn with_cooldown(mut self, cooldown_ms: u64) -> Self {
        self.cooldown_ms = cooldown_ms;
        self
    }

    pub fn with_charge(mut self, charge_ms: u64) -> Self {
        self.charge_ms = charge_ms;
        self
    }

    pub fn with_function(mut self, function_id: u16) -> Self {
        self.function_id = Some(function_id);
        self
    }

    pub fn with_weight(mut self, weight: u16) -> Self {
        self.ai_weight = weight;
        self
    }

    pub fn passive(mut self) -> Self {
        self.active = false;
        self
    }

    /// Skill can only be aimed at an opponent
    pub fn targets_enemy(&self) -> bool {
        self.target_type == TargetType::Enemy
    }

    /// Skill has to be used from within its range
    pub fn is_range_limited(&self) -> bool {
        self.range > 0.0
    }
}

/// All skill definitions known to a server
#[derive(Debug, Clone, Default)]
pub struct SkillCatalog {
    skills: HashMap<SkillId, SkillDefinition>,
}

impl SkillCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, skill: SkillDefinition) {
        self.skills.insert(skill.id, skill);
    }

    pub fn get(&self, id: SkillId) -> Option<&SkillDefinition> {
        self.skills.get(&id)
    }

    pub fn len(&self) -> usize {
        self.skills.len()
    }

    pub fn is_empty(&self) -> bool {
        self.skills.is_empty()
    }
}

impl FromIterator<SkillDefinition> for SkillCatalog {
    fn from_iter<I: IntoIterator<Item = SkillDefinition>>(iter: I) -> Self {
        let mut catalog = SkillCatalog::new();
        for skill in iter {
            catalog.insert(skill);
        }
        catalog
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_skill_builder() {
        let skill = SkillDefinition::new(1, "Bite", TargetType::Enemy, SkillFormula::Damage)
            .with_range(200.0)
            .with_cost(0, 5)
            .with_cooldown(1500)
            .with_weight(3);

        assert!(skill.active);
        assert!(skill.targets_enemy());
        assert_eq!(skill.cost.mp, 5);
        assert_eq!(skill.ai_weight, 3);
    }

    #[test]
    fn test_catalog_lookup() {
        let catalog: SkillCatalog = [
            SkillDefinition::new(1, "Bite", TargetType::Enemy, SkillFormula::Damage),
            SkillDefinition::new(2, "Dia", TargetType::Ally, SkillFormula::Heal),
        ]
        .into_iter()
        .collect();

        assert_eq!(catalog.len(), 2);
        assert_eq!(catalog.get(2).map(|s| s.name.as_str()), Some("Dia"));
        assert!(catalog.get(3).is_none());
    }

    #[test]
    fn test_skill_deserialize_defaults() {
        let skill: SkillDefinition = serde_yaml::from_str(
            "id: 5\nname: Agi\ntarget_type: enemy\nformula: damage\nrange: 1200\n",
        )
        .unwrap();
        assert!(skill.active);
        assert_eq!(skill.ai_weight, 1);
        assert_eq!(skill.cost, SkillCost::default());
        assert_eq!(skill.range, 1200.0);
    }
}
