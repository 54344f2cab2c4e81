// Copyright 2026 The Cadence Project
// SPDX-License-Identifier: Apache-2.0

use std::sync::{Arc, Mutex};

use uuid::Uuid;

use crate::event::{CachedEvent, HandlerResponse};
use crate::interceptor::chain::InterceptorChain;
use crate::interceptor::types::{AutoClearStrategy, Interceptor};

/// Result of one dispatch: the final chain response plus the identities
/// notified, so the caller can update the cached entry's notified set.
#[derive(Debug)]
pub struct DispatchOutcome {
    pub response: HandlerResponse,
    pub notified: Vec<Uuid>,
}

/// The dynamic set of subscribers.
///
/// The lock is held only to snapshot or edit the list; handlers always
/// run outside it, so a handler may add or remove subscribers (the
/// auto-remove sweep does exactly that).
#[derive(Default)]
pub struct InterceptorRegistry {
    items: Mutex<Vec<Arc<Interceptor>>>,
}

impl InterceptorRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a subscriber. With `is_only`, refuses when a subscriber
    /// with the same name is already present.
    pub fn add(&self, interceptor: Arc<Interceptor>, is_only: bool) -> bool {
        {
            let mut items = self.items.lock().unwrap();
            if is_only && items.iter().any(|i| i.name == interceptor.name) {
                tracing::debug!(name = %interceptor.name, "duplicate subscriber refused");
                return false;
            }
            items.push(interceptor.clone());
        }
        interceptor.fire_create();
        true
    }

    /// Remove exactly this subscriber (by identity).
    pub fn remove(&self, interceptor: &Arc<Interceptor>) {
        let removed = {
            let mut items = self.items.lock().unwrap();
            let before = items.len();
            items.retain(|i| i.id != interceptor.id);
            before != items.len()
        };
        if removed {
            interceptor.fire_destroy();
        }
    }

    /// Remove every subscriber with the `Stream` auto-clear strategy.
    /// Fired by the auto-remove marker at stream end.
    pub fn remove_stream_scoped(&self) {
        let swept: Vec<Arc<Interceptor>> = {
            let mut items = self.items.lock().unwrap();
            let (gone, kept): (Vec<_>, Vec<_>) = items
                .drain(..)
                .partition(|i| i.auto_clear == AutoClearStrategy::Stream);
            *items = kept;
            gone
        };
        if !swept.is_empty() {
            tracing::debug!(count = swept.len(), "stream-scoped subscribers swept");
        }
        for interceptor in swept {
            interceptor.fire_destroy();
        }
    }

    /// Remove every subscriber whose strategy is not `Round`.
    pub fn reset(&self) {
        let swept: Vec<Arc<Interceptor>> = {
            let mut items = self.items.lock().unwrap();
            let (kept, gone): (Vec<_>, Vec<_>) = items
                .drain(..)
                .partition(|i| i.auto_clear == AutoClearStrategy::Round);
            *items = kept;
            gone
        };
        for interceptor in swept {
            interceptor.fire_destroy();
        }
    }

    /// Fire `on_destroy` on everything still alive, then clear.
    pub fn destroy(&self) {
        let all: Vec<Arc<Interceptor>> = {
            let mut items = self.items.lock().unwrap();
            items.drain(..).collect()
        };
        for interceptor in all {
            interceptor.fire_destroy();
        }
    }

    pub fn len(&self) -> usize {
        self.items.lock().unwrap().len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.lock().unwrap().is_empty()
    }

    pub fn contains_name(&self, name: &str) -> bool {
        self.items.lock().unwrap().iter().any(|i| i.name == name)
    }

    // -----------------------------------------------------------------------
    // Dispatch
    // -----------------------------------------------------------------------

    /// Deliver one cached entry: match, sort, filter already-notified,
    /// then drive the chain.
    pub fn deliver(&self, cached: &CachedEvent, is_peek: bool) -> DispatchOutcome {
        let snapshot: Vec<Arc<Interceptor>> = self.items.lock().unwrap().clone();

        let mut matched: Vec<(Arc<Interceptor>, i32)> = Vec::new();
        for subscriber in snapshot {
            let spec = subscriber.watches.iter().find(|w| w.matches(&cached.event));
            match spec {
                Some(spec) if subscriber.is_peek == is_peek => {
                    subscriber.set_current_watch(Some(spec.clone()));
                    let priority = spec.priority;
                    matched.push((subscriber, priority));
                }
                _ => subscriber.set_current_watch(None),
            }
        }

        // Stable: equal priorities keep registration order.
        matched.sort_by(|a, b| b.1.cmp(&a.1));

        let runnable: Vec<Arc<Interceptor>> = matched
            .into_iter()
            .map(|(subscriber, _)| subscriber)
            .filter(|s| !cached.notified_subscribers.contains(&s.id))
            .collect();

        let mut chain = InterceptorChain::new(runnable, cached.event.element_type.clone());
        let initial = HandlerResponse::initial(cached.event.clone(), cached.req_url.clone());
        let response = chain.proceed(initial);
        DispatchOutcome {
            response,
            notified: chain.notified_ids(),
        }
    }
}
