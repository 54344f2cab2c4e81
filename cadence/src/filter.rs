// Copyright 2026 The Cadence Project
// SPDX-License-Identifier: Apache-2.0

// Event filtering — defined in M1.4
//
// Asynchronous one-to-many expansion of every event headed for the cache
// pool. Two slots: a permanent filter installed at engine init, and a
// transitory filter installed per request. The transitory slot wins.

use std::sync::{Arc, Mutex};

use crate::event::Event;

/// Expands one event into zero or more events.
///
/// Implementations are injected by the application; the engine runs every
/// adapter-produced event and every synthetic marker through the active
/// filter before admission.
#[async_trait::async_trait]
pub trait EventFilter: Send + Sync {
    async fn expand(&self, event: Event) -> Vec<Event>;
}

/// Holds the permanent and transitory filter slots.
pub struct FilterService {
    permanent: Mutex<Option<Arc<dyn EventFilter>>>,
    transitory: Mutex<Option<Arc<dyn EventFilter>>>,
}

impl FilterService {
    pub fn new(permanent: Option<Arc<dyn EventFilter>>) -> Self {
        Self {
            permanent: Mutex::new(permanent),
            transitory: Mutex::new(None),
        }
    }

    /// Install the per-request filter. Replaces any previous one.
    pub fn set_transitory(&self, filter: Arc<dyn EventFilter>) {
        *self.transitory.lock().unwrap() = Some(filter);
    }

    /// Resolve one event: transitory filter if present, else permanent,
    /// else the singleton list containing the input.
    pub async fn resolve(&self, event: Event) -> Vec<Event> {
        let active = {
            let transitory = self.transitory.lock().unwrap();
            match transitory.as_ref() {
                Some(f) => Some(f.clone()),
                None => self.permanent.lock().unwrap().clone(),
            }
        };
        match active {
            Some(filter) => filter.expand(event).await,
            None => vec![event],
        }
    }

    /// Clears only the transitory slot. Called at stream end.
    pub fn reset(&self) {
        *self.transitory.lock().unwrap() = None;
    }

    /// Clears both slots.
    pub fn destroy(&self) {
        *self.transitory.lock().unwrap() = None;
        *self.permanent.lock().unwrap() = None;
    }
}
