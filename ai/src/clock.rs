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
//! Monotonic server clock
//!
//! All AI timing (command delays, status timers, cooldowns, motion stamps)
//! is expressed in microseconds since the clock was started.

use tokio::time::Instant;

/// Monotonic clock measuring server time in microseconds
#[derive(Debug, Clone, Copy)]
pub struct ServerClock {
    started: Instant,
}

impl ServerClock {
    /// Start a new clock at zero
    pub fn new() -> Self {
        Self {
            started: Instant::now(),
        }
    }

    /// Microseconds elapsed since the clock started
    pub fn now(&self) -> u64 {
        self.started.elapsed().as_micros() as u64
    }
}

impl Default for ServerClock {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test(start_paused = true)]
    async fn test_clock_advances_with_time() {
        let clock = ServerClock::new();
        let start = clock.now();

        tokio::time::advance(Duration::from_millis(250)).await;
        assert_eq!(clock.now() - start, 250_000);
    }

    #[test]
    fn test_clock_is_monotonic() {
        let clock = ServerClock::new();
        let a = clock.now();
        let b = clock.now();
        assert!(b >= a);
    }
}
