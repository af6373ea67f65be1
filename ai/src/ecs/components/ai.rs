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

//! AI state component: status machine and command queue for one entity

use super::{AiCommand, CommandId, EntityId, LogicGroup, SkillId, SkillRole};
use crate::ecs::hooks::BehaviorPolicy;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap, VecDeque};
use std::sync::Arc;

/// High level behavior an AI controlled entity is in
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AiStatus {
    Idle,
    Wandering,
    Following,
    Aggro,
    Combat,
}

impl AiStatus {
    /// Name of the behavior hook that may override this status
    pub fn hook_action(&self) -> &'static str {
        match self {
            AiStatus::Idle => "idle",
            AiStatus::Wandering => "wander",
            AiStatus::Following => "follow",
            AiStatus::Aggro => "aggro",
            AiStatus::Combat => "combat",
        }
    }

    /// Status implies a current target
    pub fn is_hostile(&self) -> bool {
        matches!(self, AiStatus::Aggro | AiStatus::Combat)
    }
}

/// A skill and its selection weight
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WeightedSkill {
    pub skill_id: SkillId,
    pub weight: u16,
}

/// Usable skills grouped by the role they fill
pub type SkillMap = BTreeMap<SkillRole, Vec<WeightedSkill>>;

/// Per-entity AI state
///
/// Attached to every AI controlled entity by `AiManager::prepare`. The
/// command queue is strictly head-first: only the head command is ever
/// started, and at most one command is started but unresolved at a time.
#[derive(Debug, Clone)]
pub struct AiState {
    status: AiStatus,
    previous_status: AiStatus,
    default_status: AiStatus,
    status_changed: bool,
    commands: VecDeque<AiCommand>,
    next_command_id: CommandId,
    target: Option<EntityId>,
    follow_target: Option<EntityId>,
    skill_map: Option<SkillMap>,
    logic_group: Arc<LogicGroup>,
    overrides: HashMap<String, BehaviorPolicy>,
    despawn_timeout: Option<u64>,
    despawn_delay: Option<u64>,
    next_target_time: u64,
    wanders: bool,
}

impl AiState {
    /// Create an idle AI state using the given tunables
    pub fn new(logic_group: Arc<LogicGroup>) -> Self {
        Self {
            status: AiStatus::Idle,
            previous_status: AiStatus::Idle,
            default_status: AiStatus::Idle,
            status_changed: false,
            commands: VecDeque::new(),
            next_command_id: 1,
            target: None,
            follow_target: None,
            skill_map: None,
            logic_group,
            overrides: HashMap::new(),
            despawn_timeout: None,
            despawn_delay: None,
            next_target_time: 0,
            wanders: false,
        }
    }

    pub fn status(&self) -> AiStatus {
        self.status
    }

    pub fn previous_status(&self) -> AiStatus {
        self.previous_status
    }

    pub fn default_status(&self) -> AiStatus {
        self.default_status
    }

    pub fn set_default_status(&mut self, status: AiStatus) {
        self.default_status = status;
    }

    /// Change the current status
    ///
    /// Setting the status already in effect is ignored unless `force` is
    /// set. Returns whether the status was applied.
    pub fn set_status(&mut self, status: AiStatus, force: bool) -> bool {
        if status == self.status && !force {
            return false;
        }

        self.previous_status = self.status;
        self.status = status;
        self.status_changed = true;
        true
    }

    /// Fall back to the default status
    pub fn reset_to_default(&mut self) -> bool {
        self.set_status(self.default_status, false)
    }

    pub fn status_changed(&self) -> bool {
        self.status_changed
    }

    pub fn reset_status_changed(&mut self) {
        self.status_changed = false;
    }

    /// Entity has nothing to do without outside stimulus
    pub fn is_idle(&self) -> bool {
        match self.status {
            AiStatus::Idle => true,
            AiStatus::Wandering => !self.wanders,
            _ => false,
        }
    }

    /// Append a command, optionally clearing the queue first
    pub fn queue_command(&mut self, mut command: AiCommand, interrupt: bool) -> CommandId {
        if interrupt {
            self.clear_commands();
        }

        let id = self.next_command_id;
        self.next_command_id += 1;
        command.set_id(id);
        self.commands.push_back(command);
        id
    }

    /// Put a command in front of the current head
    ///
    /// Used when a command needs a prerequisite step, such as closing in on
    /// a target before a skill can be used. The current head must not have
    /// been started.
    pub fn push_front_command(&mut self, mut command: AiCommand) -> CommandId {
        let id = self.next_command_id;
        self.next_command_id += 1;
        command.set_id(id);
        self.commands.push_front(command);
        id
    }

    pub fn current_command(&self) -> Option<&AiCommand> {
        self.commands.front()
    }

    pub fn current_command_mut(&mut self) -> Option<&mut AiCommand> {
        self.commands.front_mut()
    }

    /// Remove the head command
    ///
    /// With `expected` set the head is only removed if it is that command,
    /// so a command superseded in the meantime is never popped by mistake.
    pub fn pop_command(&mut self, expected: Option<CommandId>) -> Option<AiCommand> {
        match (expected, self.commands.front()) {
            (Some(id), Some(head)) if head.id() != id => None,
            _ => self.commands.pop_front(),
        }
    }

    pub fn clear_commands(&mut self) {
        self.commands.clear();
    }

    /// Clear the queue, keeping a started skill at the head
    ///
    /// A skill already in flight has to run to completion or fail through
    /// the ability service, so it survives status changes.
    pub fn clear_commands_keep_skill(&mut self) {
        let keep = self
            .commands
            .front()
            .is_some_and(|cmd| cmd.is_skill_in_flight());

        if keep {
            self.commands.truncate(1);
        } else {
            self.commands.clear();
        }
    }

    pub fn commands(&self) -> impl Iterator<Item = &AiCommand> {
        self.commands.iter()
    }

    pub fn command_count(&self) -> usize {
        self.commands.len()
    }

    pub fn target(&self) -> Option<EntityId> {
        self.target
    }

    /// Replace the target without any aggro bookkeeping
    ///
    /// Targeting keeps pursuer sets in step with this value, so everything
    /// else goes through it.
    pub(crate) fn set_target(&mut self, target: Option<EntityId>) {
        self.target = target;
    }

    /// Re-point queued commands aimed at `old` to `new`
    pub(crate) fn retarget_commands(&mut self, old: Option<EntityId>, new: Option<EntityId>) {
        for cmd in self.commands.iter_mut() {
            cmd.retarget(old, new);
        }
    }

    pub fn follow_target(&self) -> Option<EntityId> {
        self.follow_target
    }

    pub fn set_follow_target(&mut self, follow: Option<EntityId>) {
        self.follow_target = follow;
    }

    pub fn skill_map(&self) -> Option<&SkillMap> {
        self.skill_map.as_ref()
    }

    pub(crate) fn set_skill_map(&mut self, map: SkillMap) {
        self.skill_map = Some(map);
    }

    /// Force the skill map to be rebuilt on next use
    pub fn invalidate_skill_map(&mut self) {
        self.skill_map = None;
    }

    pub fn logic_group(&self) -> &LogicGroup {
        &self.logic_group
    }

    pub fn set_logic_group(&mut self, logic_group: Arc<LogicGroup>) {
        self.logic_group = logic_group;
    }

    /// Policy for a behavior action such as `"combat"` or `"target"`
    pub fn policy(&self, action: &str) -> &BehaviorPolicy {
        self.overrides.get(action).unwrap_or(&BehaviorPolicy::None)
    }

    pub fn set_policy(&mut self, action: impl Into<String>, policy: BehaviorPolicy) {
        self.overrides.insert(action.into(), policy);
    }

    pub fn despawn_timeout(&self) -> Option<u64> {
        self.despawn_timeout
    }

    pub fn set_despawn_timeout(&mut self, timeout: Option<u64>) {
        self.despawn_timeout = timeout;
    }

    /// Despawn this long after the entity's first tick
    pub fn set_despawn_delay(&mut self, delay: Option<u64>) {
        self.despawn_delay = delay;
    }

    /// Turn a pending despawn delay into a timeout relative to `now`
    pub(crate) fn arm_despawn_timeout(&mut self, now: u64) {
        if let Some(delay) = self.despawn_delay.take() {
            self.despawn_timeout = Some(now + delay);
        }
    }

    pub fn next_target_time(&self) -> u64 {
        self.next_target_time
    }

    pub fn set_next_target_time(&mut self, time: u64) {
        self.next_target_time = time;
    }

    /// Entity has a spawn area, spot or free roaming distance to wander with
    pub fn wanders(&self) -> bool {
        self.wanders
    }

    pub fn set_wanders(&mut self, wanders: bool) {
        self.wanders = wanders;
    }
}
