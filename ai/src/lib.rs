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
//! NPC decision and command engine for zone partitioned worlds
//!
//! Every AI controlled entity carries an [`ecs::components::AiState`] with a
//! status, a current target and a queue of commands. The
//! [`ecs::systems::AiManager`] ticks each zone, choosing targets, skills and
//! movement and driving the head command forward.

pub mod clock;
pub mod config;
pub mod ecs;
pub mod error;
pub mod random;
