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
//! Behavior hooks
//!
//! Individual behaviors can replace the built-in logic for an action
//! (`"idle"`, `"wander"`, `"follow"`, `"aggro"`, `"combat"`, target
//! selection via `"target"`, and preparation) with a named hook. Hooks are
//! plain closures registered by name; a behavior refers to them through a
//! [`BehaviorPolicy`].

use crate::ecs::components::{AiState, EntityId};
use crate::ecs::zone::Zone;
use crate::random::RandomSource;
use std::collections::HashMap;
use std::sync::Arc;

/// Action name used for target selection overrides
pub const TARGET_ACTION: &str = "target";

/// Action name passed to a behavior's prepare hook
pub const PREPARE_ACTION: &str = "prepare";

/// Action name passed to hooks run by scripted commands
pub const SCRIPT_ACTION: &str = "script";

/// How a behavior handles one action
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum BehaviorPolicy {
    /// Use the built-in logic
    #[default]
    None,
    /// Run the named hook instead
    NamedOverride(String),
}

impl BehaviorPolicy {
    /// Name of the overriding hook, if any
    pub fn hook(&self) -> Option<&str> {
        match self {
            BehaviorPolicy::None => None,
            BehaviorPolicy::NamedOverride(name) => Some(name.as_str()),
        }
    }
}

/// Outcome of running a hook
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HookResult {
    /// Hook failed; nothing happens this tick
    Error,
    /// Hook did not act; built-in logic may run, or a scripted command
    /// stays queued
    Pending,
    /// Hook acted and something observable changed
    Done,
}

/// Everything a hook may look at or change
pub struct HookContext<'a> {
    pub zone: &'a mut Zone,
    pub entity: EntityId,
    pub ai: &'a mut AiState,
    pub rng: &'a mut dyn RandomSource,
    pub now: u64,
    /// Action the hook is running for
    pub action: &'a str,
    /// Viable targets, for target selection
    pub candidates: &'a [EntityId],
    /// Target picked by a target selection hook
    pub selected: Option<EntityId>,
}

pub type Hook = Arc<dyn Fn(&mut HookContext<'_>) -> HookResult + Send + Sync>;

/// Named behavior hooks
#[derive(Clone, Default)]
pub struct HookRegistry {
    hooks: HashMap<String, Hook>,
}

impl HookRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a hook, replacing any hook with the same name
    pub fn register<F>(&mut self, name: impl Into<String>, hook: F)
    where
        F: Fn(&mut HookContext<'_>) -> HookResult + Send + Sync + 'static,
    {
        self.hooks.insert(name.into(), Arc::new(hook));
    }

    pub fn contains(&self, name: &str) -> bool {
        self.hooks.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.hooks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.hooks.is_empty()
    }

    /// Run a hook by name
    ///
    /// An unknown hook is reported and treated as an error.
    pub fn call(&self, name: &str, context: &mut HookContext<'_>) -> HookResult {
        match self.hooks.get(name) {
            Some(hook) => hook(context),
            None => {
                tracing::warn!(
                    "Entity {} refers to unknown hook '{}' for '{}'",
                    context.entity,
                    name,
                    context.action
                );
                HookResult::Error
            }
        }
    }
}

impl std::fmt::Debug for HookRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut names: Vec<&String> = self.hooks.keys().collect();
        names.sort();
        f.debug_struct("HookRegistry").field("hooks", &names).finish()
    }
}
