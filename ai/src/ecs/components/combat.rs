//
// Copyright 2025 Hans W. Uhlig. All Rights Reserved.
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

//! Combat components for fighting state, timed statuses and pursuit

use super::{EntityId, SkillId};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};

/// Timed status flags that expire at a server time
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum StatusTimer {
    /// Entity is waiting out a command delay
    Waiting,
    /// Entity was hit and cannot execute abilities
    HitStun,
    /// Entity is being knocked back
    Knockback,
    /// Entity is rooted in place
    Immobile,
    /// Entity cannot activate abilities
    Silenced,
}

impl StatusTimer {
    pub fn as_str(&self) -> &'static str {
        match self {
            StatusTimer::Waiting => "Waiting",
            StatusTimer::HitStun => "HitStun",
            StatusTimer::Knockback => "Knockback",
            StatusTimer::Immobile => "Immobile",
            StatusTimer::Silenced => "Silenced",
        }
    }
}

/// An ability that has been activated but has not resolved yet
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActivatedAbility {
    pub activation_id: u32,
    pub skill_id: SkillId,
    pub target: Option<EntityId>,
    pub activation_time: u64,
    /// Server time at which the charge completes
    pub charged_time: u64,
}

impl ActivatedAbility {
    pub fn is_charged(&self, now: u64) -> bool {
        now >= self.charged_time
    }
}

/// Combat state component
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Combatant {
    /// Entities in the same faction group never target each other
    pub faction_group: i32,
    pub hp: i32,
    pub max_hp: i32,
    pub mp: i32,
    pub max_mp: i32,
    /// Entity is fully present in the zone and may be interacted with
    pub ready: bool,
    /// Entity is never selected as an AI target
    pub ai_ignored: bool,
    /// Partner or owner sharing a single pursuer slot with this entity
    pub linked: Option<EntityId>,
    /// Entities this one has exchanged hits with
    pub opponents: HashSet<EntityId>,
    pub status_times: HashMap<StatusTimer, u64>,
    /// Skills the entity currently knows
    pub skills: Vec<SkillId>,
    /// Server time each skill comes off cooldown
    pub cooldowns: HashMap<SkillId, u64>,
    pub locked_skills: HashSet<SkillId>,
    pub activated: Option<ActivatedAbility>,
}

impl Combatant {
    /// Create a new combatant at full health
    pub fn new(faction_group: i32, max_hp: i32, max_mp: i32) -> Self {
        Self {
            faction_group,
            hp: max_hp,
            max_hp,
            mp: max_mp,
            max_mp,
            ready: true,
            ai_ignored: false,
            linked: None,
            opponents: HashSet::new(),
            status_times: HashMap::new(),
            skills: Vec::new(),
            cooldowns: HashMap::new(),
            locked_skills: HashSet::new(),
            activated: None,
        }
    }

    /// Set the known skills
    pub fn with_skills(mut self, skills: impl IntoIterator<Item = SkillId>) -> Self {
        self.skills = skills.into_iter().collect();
        self
    }

    /// Link a partner or owner
    pub fn with_link(mut self, linked: EntityId) -> Self {
        self.linked = Some(linked);
        self
    }

    pub fn is_alive(&self) -> bool {
        self.hp > 0
    }

    /// Current HP as a fraction of max HP
    pub fn hp_fraction(&self) -> f32 {
        if self.max_hp <= 0 {
            return 0.0;
        }
        self.hp as f32 / self.max_hp as f32
    }

    pub fn can_act(&self) -> bool {
        self.is_alive() && !self.status_times.contains_key(&StatusTimer::Knockback)
    }

    pub fn can_move(&self) -> bool {
        self.is_alive()
            && !self.status_times.contains_key(&StatusTimer::Immobile)
            && !self.status_times.contains_key(&StatusTimer::Knockback)
    }

    pub fn can_use_skills(&self) -> bool {
        self.can_act() && !self.status_times.contains_key(&StatusTimer::Silenced)
    }

    /// Entity is currently charging an ability
    pub fn is_charging(&self) -> bool {
        self.activated.is_some()
    }

    pub fn status_time(&self, timer: StatusTimer) -> Option<u64> {
        self.status_times.get(&timer).copied()
    }

    pub fn set_status_time(&mut self, timer: StatusTimer, until: u64) {
        self.status_times.insert(timer, until);
    }

    /// Drop every timed status that has run out
    pub fn expire_status_times(&mut self, now: u64) {
        self.status_times.retain(|_, until| *until > now);
    }

    pub fn cooldown_ready(&self, skill: SkillId, now: u64) -> bool {
        self.cooldowns.get(&skill).is_none_or(|until| *until <= now)
    }

    pub fn add_opponent(&mut self, opponent: EntityId) -> bool {
        self.opponents.insert(opponent)
    }

    pub fn remove_opponent(&mut self, opponent: EntityId) -> bool {
        self.opponents.remove(&opponent)
    }

    pub fn in_combat(&self) -> bool {
        !self.opponents.is_empty()
    }
}

/// Entities currently pursuing this entity
///
/// Present on every active entity, AI controlled or not. Only ever mutated
/// through the owning zone so that bookkeeping stays symmetric with each
/// pursuer's target.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Pursuers {
    pub ids: HashSet<EntityId>,
}

impl Pursuers {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn contains(&self, id: EntityId) -> bool {
        self.ids.contains(&id)
    }

    pub fn len(&self) -> usize {
        self.ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }
}
