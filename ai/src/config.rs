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
//! Command line arguments and YAML configuration
//!
//! The configuration file carries the engine switches, every logic group,
//! behavior and skill definition, and the zones the headless server runs.

use crate::ecs::components::{
    EntityKind, Line, LogicGroup, Point, SkillDefinition, SkillId, SpawnOrigin,
};
use crate::ecs::systems::DEFAULT_LOGIC_GROUP;
use crate::error::ConfigError;
use clap::Parser;
use serde::{Deserialize, Serialize};
use serde_env_field::EnvField;
use std::collections::{HashMap, HashSet};
use std::num::ParseIntError;
use std::str::FromStr;

#[derive(Debug, Parser)]
#[command(version, about, long_about = None)]
pub struct Arguments {
    #[arg(
        short = 'c',
        long = "config",
        help = "Path to configuration file",
        default_value = "ai/config.yaml"
    )]
    pub config_file: String,

    #[arg(
        short = 'e',
        long = "env",
        help = "Path to environment file",
        default_value = "ai/.env"
    )]
    pub env_file: Option<String>,
}

impl Default for Arguments {
    fn default() -> Self {
        Self {
            config_file: "config.yaml".to_string(),
            env_file: Some(".env".to_string()),
        }
    }
}

#[derive(Debug, Default, Serialize, Deserialize)]
pub struct Configuration {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub engine: EngineConfig,
    #[serde(default)]
    pub logic_groups: Vec<LogicGroup>,
    #[serde(default)]
    pub behaviors: Vec<BehaviorDefinition>,
    #[serde(default)]
    pub skills: Vec<SkillDefinition>,
    #[serde(default)]
    pub zones: Vec<ZoneDefinition>,
}

impl Configuration {
    pub fn load(path: &str) -> Result<Configuration, ConfigError> {
        let conf: Configuration = serde_yaml::from_reader(std::fs::File::open(path)?)?;
        conf.validate()?;
        Ok(conf)
    }

    /// Check that every cross reference in the configuration resolves
    pub fn validate(&self) -> Result<(), ConfigError> {
        let groups: HashSet<&str> = self
            .logic_groups
            .iter()
            .map(|g| g.id.as_str())
            .chain(std::iter::once(DEFAULT_LOGIC_GROUP))
            .collect();
        for behavior in &self.behaviors {
            if !groups.contains(behavior.logic_group.as_str()) {
                return Err(ConfigError::Invalid(format!(
                    "Behavior '{}' uses unknown logic group '{}'",
                    behavior.id, behavior.logic_group
                )));
            }
        }

        let behaviors: HashSet<&str> = self.behaviors.iter().map(|b| b.id.as_str()).collect();
        let skills: HashSet<SkillId> = self.skills.iter().map(|s| s.id).collect();
        for zone in &self.zones {
            for actor in &zone.actors {
                if let Some(behavior) = &actor.behavior {
                    if !behaviors.contains(behavior.as_str()) {
                        return Err(ConfigError::Invalid(format!(
                            "Actor '{}' in zone {} uses unknown behavior '{}'",
                            actor.name, zone.id, behavior
                        )));
                    }
                }
                if let Some(skill) = actor.skills.iter().find(|s| !skills.contains(s)) {
                    return Err(ConfigError::Invalid(format!(
                        "Actor '{}' in zone {} knows unknown skill {}",
                        actor.name, zone.id, skill
                    )));
                }
            }
        }

        Ok(())
    }
}

/// Settings for the headless server loop
#[derive(Debug, Default, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Time between AI ticks
    #[serde(default)]
    pub tick_interval: EnvField<TickInterval>,

    /// Seed for AI randomness; drawn from the OS when absent
    #[serde(default)]
    pub seed: Option<EnvField<u64>>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TickInterval(u64);

impl TickInterval {
    pub fn as_millis(&self) -> u64 {
        self.0
    }

    pub fn as_duration(&self) -> std::time::Duration {
        std::time::Duration::from_millis(self.0.max(1))
    }
}

impl FromStr for TickInterval {
    type Err = ParseIntError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        tracing::debug!("Parsing tick interval from string: {}", s);
        Ok(Self(u64::from_str(s.trim())?))
    }
}

impl Default for TickInterval {
    fn default() -> Self {
        Self(100)
    }
}

impl std::fmt::Display for TickInterval {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}ms", self.0)
    }
}

/// Switches that change engine wide AI behavior
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Pass over targets that already have too many pursuers
    pub aggro_limit_enabled: bool,
    /// Chase in a straight line when nothing is in the way
    pub lazy_pathing: bool,
    /// Pause briefly after every executed skill
    pub combat_stagger: bool,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            aggro_limit_enabled: true,
            lazy_pathing: true,
            combat_stagger: false,
        }
    }
}

/// A named behavior: a logic group plus optional hook overrides
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BehaviorDefinition {
    pub id: String,
    pub logic_group: String,
    /// Action name to hook name
    #[serde(default)]
    pub overrides: HashMap<String, String>,
    /// Hook run once when an entity is prepared
    #[serde(default)]
    pub prepare: Option<String>,
    /// Seconds after preparation at which the entity despawns
    #[serde(default)]
    pub despawn_after: Option<u64>,
}

impl BehaviorDefinition {
    pub fn new(id: impl Into<String>, logic_group: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            logic_group: logic_group.into(),
            overrides: HashMap::new(),
            prepare: None,
            despawn_after: None,
        }
    }

    pub fn with_override(mut self, action: impl Into<String>, hook: impl Into<String>) -> Self {
        self.overrides.insert(action.into(), hook.into());
        self
    }

    pub fn with_prepare(mut self, hook: impl Into<String>) -> Self {
        self.prepare = Some(hook.into());
        self
    }

    pub fn with_despawn_after(mut self, seconds: u64) -> Self {
        self.despawn_after = Some(seconds);
        self
    }
}

/// A zone and the actors it starts with
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ZoneDefinition {
    pub id: u32,
    pub name: String,
    #[serde(default)]
    pub walls: Vec<Line>,
    #[serde(default)]
    pub actors: Vec<ActorDefinition>,
}

/// An actor placed in a zone at startup
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ActorDefinition {
    pub name: String,
    pub kind: EntityKind,
    pub position: Point,
    #[serde(default)]
    pub rotation: f32,
    #[serde(default = "ActorDefinition::default_speed")]
    pub run_speed: f32,
    #[serde(default)]
    pub faction_group: i32,
    #[serde(default = "ActorDefinition::default_hp")]
    pub max_hp: i32,
    #[serde(default)]
    pub max_mp: i32,
    #[serde(default)]
    pub skills: Vec<SkillId>,
    /// Behavior id; actors without one are not AI controlled
    #[serde(default)]
    pub behavior: Option<String>,
    #[serde(default)]
    pub origin: Option<SpawnOrigin>,
}

impl ActorDefinition {
    fn default_speed() -> f32 {
        300.0
    }

    fn default_hp() -> i32 {
        100
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    static ENV_MUTEX: Mutex<()> = Mutex::new(());

    const SAMPLE: &str = r#"
server:
  tick_interval: 50
engine:
  lazy_pathing: false
logic_groups:
  - id: beast
    aggression: 80
behaviors:
  - id: wolf
    logic_group: beast
    overrides:
      combat: howl
skills:
  - id: 1
    name: Bite
    target_type: enemy
    formula: damage
    range: 200
zones:
  - id: 1
    name: Forest
    walls:
      - a: { x: 0.0, y: -50.0 }
        b: { x: 0.0, y: 50.0 }
    actors:
      - name: Wolf
        kind: Enemy
        position: { x: 100.0, y: 0.0 }
        faction_group: 2
        skills: [1]
        behavior: wolf
        origin:
          area:
            shape: spot
            center: { x: 100.0, y: 0.0 }
            width: 200.0
            height: 200.0
"#;

    #[test]
    fn test_arguments_default() {
        let args = Arguments::default();
        assert_eq!(args.config_file, "config.yaml");
        assert_eq!(args.env_file, Some(".env".to_string()));
    }

    #[test]
    fn test_configuration_default() {
        let config = Configuration::default();
        assert_eq!(config.server.tick_interval.as_millis(), 100);
        assert!(config.engine.aggro_limit_enabled);
        assert!(config.engine.lazy_pathing);
        assert!(!config.engine.combat_stagger);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_configuration_load_missing_file() {
        let _guard = ENV_MUTEX.lock().unwrap_or_else(|e| e.into_inner());
        let result = Configuration::load("non_existent.yaml");
        assert!(matches!(result, Err(ConfigError::Io(_))));
    }

    #[test]
    fn test_configuration_load_from_file() {
        let _guard = ENV_MUTEX.lock().unwrap_or_else(|e| e.into_inner());

        let temp_dir = tempfile::tempdir().unwrap();
        let file_path = temp_dir.path().join("config.yaml");
        std::fs::write(&file_path, SAMPLE).unwrap();

        let config = Configuration::load(file_path.to_str().unwrap()).unwrap();

        assert_eq!(config.server.tick_interval.as_millis(), 50);
        assert!(!config.engine.lazy_pathing);
        assert_eq!(config.logic_groups[0].aggression, 80);
        assert_eq!(config.logic_groups[0].heal_threshold, 0.3);
        assert_eq!(
            config.behaviors[0].overrides.get("combat").map(String::as_str),
            Some("howl")
        );
        assert_eq!(config.zones[0].walls.len(), 1);
        let wolf = &config.zones[0].actors[0];
        assert_eq!(wolf.max_hp, 100);
        assert!(wolf.origin.as_ref().is_some_and(|o| o.has_spawn_area()));
    }

    #[test]
    fn test_configuration_rejects_unknown_logic_group() {
        let mut config = Configuration::default();
        config
            .behaviors
            .push(BehaviorDefinition::new("wolf", "missing"));
        assert!(matches!(config.validate(), Err(ConfigError::Invalid(_))));
    }

    #[test]
    fn test_configuration_rejects_unknown_skill() {
        let _guard = ENV_MUTEX.lock().unwrap_or_else(|e| e.into_inner());
        let mut config: Configuration = serde_yaml::from_str(SAMPLE).unwrap();
        config.zones[0].actors[0].skills.push(99);
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_tick_interval_from_env() {
        let _guard = ENV_MUTEX.lock().unwrap_or_else(|e| e.into_inner());
        unsafe {
            std::env::set_var("WYLDLANDS_AI_TICK", "25");
        }

        let config: ServerConfig =
            serde_yaml::from_str("tick_interval: \"${WYLDLANDS_AI_TICK}\"").unwrap();

        unsafe {
            std::env::remove_var("WYLDLANDS_AI_TICK");
        }
        assert_eq!(config.tick_interval.as_millis(), 25);
    }
}
