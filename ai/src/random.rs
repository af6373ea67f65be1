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
//! Random number source used by AI decisions
//!
//! Every random choice the engine makes (whether to look for a target,
//! which target, which skill, where to wander) draws from a
//! [`RandomSource`] passed in by the caller, so that tests can script or
//! seed the outcome.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::collections::VecDeque;

/// Capability to draw random values
pub trait RandomSource {
    /// Uniform integer in `[min, max]`
    fn range_inclusive(&mut self, min: i64, max: i64) -> i64;

    /// Uniform float in `[0, 1)`
    fn unit(&mut self) -> f32;

    /// True with the given percent chance
    fn chance(&mut self, percent: u8) -> bool {
        percent > 0 && self.range_inclusive(1, 100) <= percent as i64
    }

    /// Uniform index into a collection of `len` items
    fn index(&mut self, len: usize) -> usize {
        if len <= 1 {
            return 0;
        }
        self.range_inclusive(0, len as i64 - 1) as usize
    }

    /// Either 1.0 or -1.0
    fn sign(&mut self) -> f32 {
        if self.range_inclusive(0, 1) == 0 {
            -1.0
        } else {
            1.0
        }
    }
}

impl<R: Rng> RandomSource for R {
    fn range_inclusive(&mut self, min: i64, max: i64) -> i64 {
        if max <= min {
            return min;
        }
        self.random_range(min..=max)
    }

    fn unit(&mut self) -> f32 {
        self.random::<f32>()
    }
}

/// Create a deterministic random source
pub fn seeded(seed: u64) -> StdRng {
    StdRng::seed_from_u64(seed)
}

/// Create a random source seeded from the operating system
pub fn from_entropy() -> StdRng {
    StdRng::from_os_rng()
}

/// Random source that replays a fixed sequence of values
///
/// Integers are clamped into the requested range; floats are taken as
/// `value / 100`. Once the sequence runs out every draw returns the
/// minimum of its range.
#[derive(Debug, Clone, Default)]
pub struct SequenceRandom {
    values: VecDeque<i64>,
}

impl SequenceRandom {
    pub fn new(values: impl IntoIterator<Item = i64>) -> Self {
        Self {
            values: values.into_iter().collect(),
        }
    }

    pub fn push(&mut self, value: i64) {
        self.values.push_back(value);
    }

    pub fn remaining(&self) -> usize {
        self.values.len()
    }
}

impl RandomSource for SequenceRandom {
    fn range_inclusive(&mut self, min: i64, max: i64) -> i64 {
        match self.values.pop_front() {
            Some(value) => value.clamp(min, max.max(min)),
            None => min,
        }
    }

    fn unit(&mut self) -> f32 {
        match self.values.pop_front() {
            Some(value) => (value.clamp(0, 99) as f32) / 100.0,
            None => 0.0,
        }
    }
}
