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
//! ECS Systems
//!
//! Decision making for AI controlled entities. [`AiManager`] drives the
//! per-tick status machine and delegates to the targeting, pathing and
//! skill selection systems.

mod npc_ai;
mod pathing;
mod skills;
mod targeting;

pub use npc_ai::*;
pub use pathing::*;
pub use skills::*;
pub use targeting::*;
