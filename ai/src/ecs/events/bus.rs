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
//! Event bus shared by every zone of a world
//!
//! Zones publish into one queue while they tick. The tick driver then calls
//! [`EventBus::process_events`] once, and each subscriber sees the events its
//! [`Subscription`] accepts in the order they were published.

use super::types::{EventKind, GameEvent};
use crate::ecs::components::EntityId;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError, RwLock};

pub type EventHandler = Box<dyn Fn(&GameEvent) + Send + Sync>;

/// Handle returned by the subscribe calls, used to unsubscribe later
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriberId(u64);

/// Which events a subscriber wants to see
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Subscription {
    All,
    Kinds(Vec<EventKind>),
    /// Events about the entity, plus any hostile picking it as a target
    Entity(EntityId),
}

impl Subscription {
    pub fn accepts(&self, event: &GameEvent) -> bool {
        match self {
            Subscription::All => true,
            Subscription::Kinds(kinds) => kinds.contains(&event.kind()),
            Subscription::Entity(id) => event.involves(*id),
        }
    }
}

struct Subscriber {
    id: SubscriberId,
    filter: Subscription,
    handler: EventHandler,
}

#[derive(Default)]
struct Shared {
    subscribers: RwLock<Vec<Subscriber>>,
    queue: Mutex<VecDeque<GameEvent>>,
    next_id: AtomicU64,
}

/// Queue of [`GameEvent`]s with filtered subscribers
///
/// Clones share the same queue and subscribers, which is how a world hands
/// one bus to all of its zones.
#[derive(Clone, Default)]
pub struct EventBus {
    shared: Arc<Shared>,
}

impl EventBus {
    pub fn new() -> Self {
        Self::default()
    }

    /// Receive every event
    pub fn subscribe<F>(&self, handler: F) -> SubscriberId
    where
        F: Fn(&GameEvent) + Send + Sync + 'static,
    {
        self.subscribe_filtered(Subscription::All, handler)
    }

    /// Receive only the events `filter` accepts
    ///
    /// Handlers run while the subscriber list is read locked, so they may
    /// publish but must not subscribe or unsubscribe.
    pub fn subscribe_filtered<F>(&self, filter: Subscription, handler: F) -> SubscriberId
    where
        F: Fn(&GameEvent) + Send + Sync + 'static,
    {
        let id = SubscriberId(self.shared.next_id.fetch_add(1, Ordering::Relaxed));
        self.shared
            .subscribers
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .push(Subscriber {
                id,
                filter,
                handler: Box::new(handler),
            });
        id
    }

    /// Returns false if the subscriber was already gone
    pub fn unsubscribe(&self, id: SubscriberId) -> bool {
        let mut subscribers = self
            .shared
            .subscribers
            .write()
            .unwrap_or_else(PoisonError::into_inner);
        let before = subscribers.len();
        subscribers.retain(|s| s.id != id);
        subscribers.len() != before
    }

    pub fn subscriber_count(&self) -> usize {
        self.shared
            .subscribers
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub fn publish(&self, event: GameEvent) {
        self.queue().push_back(event);
    }

    pub fn publish_all(&self, events: impl IntoIterator<Item = GameEvent>) {
        self.queue().extend(events);
    }

    /// Deliver the queued events and return how many deliveries were made
    ///
    /// Events published by a handler during delivery wait for the next call.
    pub fn process_events(&self) -> usize {
        let events = self.drain();
        if events.is_empty() {
            return 0;
        }

        let subscribers = self
            .shared
            .subscribers
            .read()
            .unwrap_or_else(PoisonError::into_inner);
        let mut delivered = 0;
        for event in &events {
            for subscriber in subscribers.iter().filter(|s| s.filter.accepts(event)) {
                (subscriber.handler)(event);
                delivered += 1;
            }
        }

        tracing::trace!(
            events = events.len(),
            delivered,
            "Processed AI events"
        );
        delivered
    }

    /// Take the queued events without delivering them
    pub fn drain(&self) -> Vec<GameEvent> {
        self.queue().drain(..).collect()
    }

    pub fn clear(&self) {
        self.queue().clear();
    }

    pub fn queue_len(&self) -> usize {
        self.queue().len()
    }

    fn queue(&self) -> std::sync::MutexGuard<'_, VecDeque<GameEvent>> {
        self.shared
            .queue
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }
}

impl std::fmt::Debug for EventBus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventBus")
            .field("queued", &self.queue_len())
            .field("subscribers", &self.subscriber_count())
            .finish()
    }
}
