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

//! Identity components for entity identification and description

use serde::{Deserialize, Serialize};

/// Zone local entity identifier
///
/// Entities never hold references to each other. Every cross-entity link
/// (targets, followers, pursuers, opponents) is stored as an `EntityId` and
/// resolved through the owning zone each time it is used, so a referent that
/// despawned between ticks simply fails to resolve.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct EntityId(pub i32);

impl EntityId {
    /// Create an EntityId from its raw value
    pub fn new(id: i32) -> Self {
        Self(id)
    }

    /// Get the raw id value
    pub fn value(&self) -> i32 {
        self.0
    }
}

impl From<i32> for EntityId {
    fn from(id: i32) -> Self {
        Self(id)
    }
}

impl std::fmt::Display for EntityId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Display name for entity identification
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Name {
    /// Primary display name
    pub display: String,
}

impl Name {
    /// Create a new name
    pub fn new(display: impl Into<String>) -> Self {
        Self {
            display: display.into(),
        }
    }
}

impl std::fmt::Display for Name {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.display)
    }
}

/// What kind of actor an entity is
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EntityKind {
    /// Player controlled character
    Character,
    /// Creature bound to a character
    Partner,
    /// Hostile spawn
    Enemy,
    /// Friendly non-player actor
    Ally,
}

impl EntityKind {
    /// Hostile entities announce the targets they acquire
    pub fn is_hostile(&self) -> bool {
        matches!(self, EntityKind::Enemy)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            EntityKind::Character => "Character",
            EntityKind::Partner => "Partner",
            EntityKind::Enemy => "Enemy",
            EntityKind::Ally => "Ally",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_entity_id_display() {
        assert_eq!(EntityId::new(42).to_string(), "#42");
        assert_eq!(EntityId::from(7).value(), 7);
    }

    #[test]
    fn test_entity_kind_hostility() {
        assert!(EntityKind::Enemy.is_hostile());
        assert!(!EntityKind::Ally.is_hostile());
        assert!(!EntityKind::Partner.is_hostile());
    }
}
