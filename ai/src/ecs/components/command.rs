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

//! Primitive AI commands queued on an entity's AI state

use super::{ActivatedAbility, EntityId, MICROS_PER_SECOND, Point, SkillId};
use std::collections::VecDeque;

/// Identifier assigned to a command when it is queued
pub type CommandId = u64;

/// What a command does when it reaches the head of the queue
#[derive(Debug, Clone, PartialEq)]
pub enum CommandKind {
    /// Do nothing until the delay elapses
    Wait,
    /// Walk a path, optionally staying within a distance band of a target
    Move {
        path: VecDeque<Point>,
        target: Option<EntityId>,
        min_dist: Option<f32>,
        max_dist: Option<f32>,
    },
    /// Activate, then execute, a skill
    UseSkill {
        skill_id: SkillId,
        activation_id: Option<u32>,
        target: Option<EntityId>,
    },
    /// Run a named behavior hook until it finishes
    Scripted { hook: String },
}

impl CommandKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            CommandKind::Wait => "Wait",
            CommandKind::Move { .. } => "Move",
            CommandKind::UseSkill { .. } => "UseSkill",
            CommandKind::Scripted { .. } => "Scripted",
        }
    }
}

/// A single queued AI command
///
/// Only the head of the queue ever runs. The first time it runs it is
/// stamped with a start time, and if it carries a delay the entity waits
/// that long before the command's own action is attempted.
#[derive(Debug, Clone, PartialEq)]
pub struct AiCommand {
    id: CommandId,
    kind: CommandKind,
    /// Delay before the command acts, in microseconds
    delay: u64,
    start_time: Option<u64>,
    retries: u8,
}

impl AiCommand {
    fn new(kind: CommandKind) -> Self {
        Self {
            id: 0,
            kind,
            delay: 0,
            start_time: None,
            retries: 0,
        }
    }

    /// Wait for a number of microseconds
    pub fn wait(delay: u64) -> Self {
        Self::new(CommandKind::Wait).with_delay(delay)
    }

    /// Wait for a number of whole seconds
    pub fn wait_seconds(seconds: u32) -> Self {
        Self::wait(seconds as u64 * MICROS_PER_SECOND)
    }

    /// Walk along a path
    pub fn move_path(path: impl IntoIterator<Item = Point>) -> Self {
        Self::new(CommandKind::Move {
            path: path.into_iter().collect(),
            target: None,
            min_dist: None,
            max_dist: None,
        })
    }

    /// Use a skill that has not been activated yet
    pub fn use_skill(skill_id: SkillId, target: Option<EntityId>) -> Self {
        Self::new(CommandKind::UseSkill {
            skill_id,
            activation_id: None,
            target,
        })
    }

    /// Execute an ability that is already charging
    pub fn use_activation(activated: &ActivatedAbility) -> Self {
        Self::new(CommandKind::UseSkill {
            skill_id: activated.skill_id,
            activation_id: Some(activated.activation_id),
            target: activated.target,
        })
    }

    /// Run a named hook
    pub fn scripted(hook: impl Into<String>) -> Self {
        Self::new(CommandKind::Scripted { hook: hook.into() })
    }

    pub fn with_delay(mut self, delay: u64) -> Self {
        self.delay = delay;
        self
    }

    /// Bind a move to a target, keeping within `[min_dist, max_dist]` of it
    ///
    /// Has no effect on commands other than moves.
    pub fn with_target(mut self, target: EntityId, min_dist: f32, max_dist: f32) -> Self {
        if let CommandKind::Move {
            target: t,
            min_dist: min,
            max_dist: max,
            ..
        } = &mut self.kind
        {
            *t = Some(target);
            *min = Some(min_dist);
            *max = Some(max_dist);
        }
        self
    }

    pub fn id(&self) -> CommandId {
        self.id
    }

    pub(crate) fn set_id(&mut self, id: CommandId) {
        self.id = id;
    }

    pub fn kind(&self) -> &CommandKind {
        &self.kind
    }

    pub(crate) fn kind_mut(&mut self) -> &mut CommandKind {
        &mut self.kind
    }

    pub fn delay(&self) -> u64 {
        self.delay
    }

    pub fn start_time(&self) -> Option<u64> {
        self.start_time
    }

    pub fn is_started(&self) -> bool {
        self.start_time.is_some()
    }

    pub(crate) fn start(&mut self, now: u64) {
        self.start_time = Some(now);
    }

    pub fn retries(&self) -> u8 {
        self.retries
    }

    /// Count another failed attempt, returning the new total
    pub(crate) fn record_retry(&mut self) -> u8 {
        self.retries = self.retries.saturating_add(1);
        self.retries
    }

    pub fn is_use_skill(&self) -> bool {
        matches!(self.kind, CommandKind::UseSkill { .. })
    }

    /// Skill command that has started or already holds an activation
    pub fn is_skill_in_flight(&self) -> bool {
        match self.kind {
            CommandKind::UseSkill { activation_id, .. } => {
                activation_id.is_some() || self.start_time.is_some()
            }
            _ => false,
        }
    }

    /// Activation a skill command is waiting on
    pub fn activation_id(&self) -> Option<u32> {
        match self.kind {
            CommandKind::UseSkill { activation_id, .. } => activation_id,
            _ => None,
        }
    }

    /// Entity the command acts on, if any
    pub fn target(&self) -> Option<EntityId> {
        match &self.kind {
            CommandKind::Move { target, .. } | CommandKind::UseSkill { target, .. } => *target,
            _ => None,
        }
    }

    /// Point a command aimed at `old` to `new` instead
    pub(crate) fn retarget(&mut self, old: Option<EntityId>, new: Option<EntityId>) {
        match &mut self.kind {
            CommandKind::Move { target, .. } | CommandKind::UseSkill { target, .. }
                if *target == old =>
            {
                *target = new;
            }
            _ => {}
        }
    }

    /// Final point of a move
    pub fn end_destination(&self) -> Option<Point> {
        match &self.kind {
            CommandKind::Move { path, .. } => path.back().copied(),
            _ => None,
        }
    }
}
