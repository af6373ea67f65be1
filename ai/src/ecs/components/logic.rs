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

//! Logic groups: tunables shared by every entity of a behavior archetype

use super::SkillRole;
use serde::{Deserialize, Serialize};

/// Relative weights used to pick a skill role before picking a skill
///
/// All zero means roles are not weighted and every eligible skill competes
/// on its own weight.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ActionWeights {
    pub close_range: u16,
    pub long_range: u16,
    pub heal: u16,
    pub support: u16,
    pub defense: u16,
}

impl ActionWeights {
    pub fn weight(&self, role: SkillRole) -> u16 {
        match role {
            SkillRole::CloseRange => self.close_range,
            SkillRole::LongRange => self.long_range,
            SkillRole::Heal => self.heal,
            SkillRole::Support => self.support,
            SkillRole::Defense => self.defense,
        }
    }

    pub fn is_enabled(&self) -> bool {
        SkillRole::ALL.iter().any(|role| self.weight(*role) > 0)
    }
}

/// Read-only tunables for one behavior archetype
///
/// Distances are in zone units, angles in degrees (full cone width), times
/// in milliseconds unless the name says otherwise. Shared between entity
/// instances through an `Arc` and never mutated after loading.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LogicGroup {
    pub id: String,
    /// Percent chance per targeting pass to look for a target out of combat
    pub aggression: u8,
    pub aggro_normal_distance: f32,
    pub aggro_normal_fov: f32,
    /// Distance at which entities charging an ability are noticed
    pub aggro_cast_distance: f32,
    pub aggro_cast_fov: f32,
    pub deaggro_distance: f32,
    /// Maximum pursuers a target may have before it is passed over
    pub aggro_limit: usize,
    /// Delay between targeting passes that found nothing
    pub target_refresh_ms: u64,
    /// HP fraction under which heal skills become eligible
    pub heal_threshold: f32,
    /// Entity may open a fight instead of waiting to be hit
    pub strike_first: bool,
    pub action_weights: ActionWeights,
    /// Percent chance to idle for a moment instead of acting in combat
    pub combat_wait_chance: u8,
    pub combat_approach_distance: f32,
    pub combat_approach_reduce: f32,
    pub circle_distance: f32,
    pub follow_distance: f32,
    /// Follow distance multiplier while aggro
    pub follow_aggro_scale: f32,
    pub retreat_distance: f32,
    pub wander_wait_min: u32,
    pub wander_wait_max: u32,
    /// Free roaming distance for entities without a spawn area; 0 disables
    pub wander_distance: f32,
    /// Pause queued after an executed skill when combat stagger is enabled
    pub stagger_ms: u64,
    pub max_command_retries: u8,
    /// Extra reach tolerated before a charged skill needs to close in
    pub activation_slack: f32,
}

impl LogicGroup {
    /// Create a logic group with default tunables
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            ..Default::default()
        }
    }

    /// Half angle of the normal aggro cone, in radians
    pub fn normal_half_fov(&self) -> f32 {
        (self.aggro_normal_fov / 2.0).to_radians()
    }

    /// Half angle of the cast aggro cone, in radians
    pub fn cast_half_fov(&self) -> f32 {
        (self.aggro_cast_fov / 2.0).to_radians()
    }
}

impl Default for LogicGroup {
    fn default() -> Self {
        Self {
            id: "default".to_string(),
            aggression: 100,
            aggro_normal_distance: 2000.0,
            aggro_normal_fov: 120.0,
            aggro_cast_distance: 3000.0,
            aggro_cast_fov: 360.0,
            deaggro_distance: 5000.0,
            aggro_limit: 5,
            target_refresh_ms: 1000,
            heal_threshold: 0.3,
            strike_first: true,
            action_weights: ActionWeights::default(),
            combat_wait_chance: 10,
            combat_approach_distance: 300.0,
            combat_approach_reduce: 250.0,
            circle_distance: 250.0,
            follow_distance: 400.0,
            follow_aggro_scale: 2.0,
            retreat_distance: 500.0,
            wander_wait_min: 3,
            wander_wait_max: 9,
            wander_distance: 0.0,
            stagger_ms: 500,
            max_command_retries: 3,
            activation_slack: 100.0,
        }
    }
}
