// Copyright 2026 The Cadence Project
// SPDX-License-Identifier: Apache-2.0

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use uuid::Uuid;

use crate::event::{Event, HandlerResponse};
use crate::interceptor::chain::InterceptorChain;

/// Handler invoked when a watched event reaches the subscriber. The
/// handler terminates the chain by returning without calling
/// [`InterceptorChain::proceed`]; go-through subscribers still run
/// afterwards. Handlers are synchronous relative to chain order.
pub type Handler =
    Arc<dyn Fn(&mut InterceptorChain, HandlerResponse) -> HandlerResponse + Send + Sync>;

type CreateHook = Arc<dyn Fn(&str) + Send + Sync>;
type MatchHook = Arc<dyn Fn(&str, &str) + Send + Sync>;
type DestroyHook = Arc<dyn Fn(&str) + Send + Sync>;

// ---------------------------------------------------------------------------
// WatchSpec
// ---------------------------------------------------------------------------

/// One interest registration: exact element type, optional exact content
/// match, and a priority (higher runs earlier).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WatchSpec {
    pub event_type: String,
    pub match_content: Option<String>,
    pub priority: i32,
}

impl WatchSpec {
    pub fn new(event_type: impl Into<String>, priority: i32) -> Self {
        Self {
            event_type: event_type.into(),
            match_content: None,
            priority,
        }
    }

    pub fn with_content(mut self, content: impl Into<String>) -> Self {
        self.match_content = Some(content.into());
        self
    }

    pub fn matches(&self, event: &Event) -> bool {
        if self.event_type != event.element_type {
            return false;
        }
        match self.match_content.as_deref() {
            None | Some("") => true,
            Some(content) => content == event.result,
        }
    }
}

// ---------------------------------------------------------------------------
// Auto-clear strategy
// ---------------------------------------------------------------------------

/// When the registry sweeps a subscriber automatically.
///
/// `Round` is legacy: it survives `reset()` but is cleared by `destroy()`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AutoClearStrategy {
    Round,
    /// Removed when the stream completes (the auto-remove marker fires).
    Stream,
}

// ---------------------------------------------------------------------------
// Interceptor
// ---------------------------------------------------------------------------

/// A named subscriber.
///
/// Identity for dedup (`is_only`) is the name; identity for the per-entry
/// notified set is the generated `id`, which stays stable across clones
/// of the `Arc`.
pub struct Interceptor {
    pub id: Uuid,
    pub name: String,
    pub watches: Vec<WatchSpec>,
    pub handler: Handler,
    pub auto_clear: AutoClearStrategy,
    /// Invoked even after an earlier handler terminated the chain.
    pub go_through: bool,
    /// Receives from the peek path instead of the paced main cache.
    pub is_peek: bool,
    pub on_create: Option<CreateHook>,
    pub on_match: Option<MatchHook>,
    pub on_destroy: Option<DestroyHook>,
    current_watch: Mutex<Option<WatchSpec>>,
    destroyed: AtomicBool,
}

impl Interceptor {
    pub fn new(
        name: impl Into<String>,
        handler: impl Fn(&mut InterceptorChain, HandlerResponse) -> HandlerResponse
            + Send
            + Sync
            + 'static,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            name: name.into(),
            watches: Vec::new(),
            handler: Arc::new(handler),
            auto_clear: AutoClearStrategy::Stream,
            go_through: false,
            is_peek: false,
            on_create: None,
            on_match: None,
            on_destroy: None,
            current_watch: Mutex::new(None),
            destroyed: AtomicBool::new(false),
        }
    }

    pub fn watch(mut self, spec: WatchSpec) -> Self {
        self.watches.push(spec);
        self
    }

    pub fn auto_clear(mut self, strategy: AutoClearStrategy) -> Self {
        self.auto_clear = strategy;
        self
    }

    pub fn go_through(mut self, value: bool) -> Self {
        self.go_through = value;
        self
    }

    pub fn peek(mut self, value: bool) -> Self {
        self.is_peek = value;
        self
    }

    pub fn on_create(mut self, hook: impl Fn(&str) + Send + Sync + 'static) -> Self {
        self.on_create = Some(Arc::new(hook));
        self
    }

    pub fn on_match(mut self, hook: impl Fn(&str, &str) + Send + Sync + 'static) -> Self {
        self.on_match = Some(Arc::new(hook));
        self
    }

    pub fn on_destroy(mut self, hook: impl Fn(&str) + Send + Sync + 'static) -> Self {
        self.on_destroy = Some(Arc::new(hook));
        self
    }

    /// The watch spec that matched during the current dispatch, set by
    /// the registry and cleared when the subscriber is excluded.
    pub fn current_watch(&self) -> Option<WatchSpec> {
        self.current_watch.lock().unwrap().clone()
    }

    pub(crate) fn set_current_watch(&self, spec: Option<WatchSpec>) {
        *self.current_watch.lock().unwrap() = spec;
    }

    pub fn is_destroyed(&self) -> bool {
        self.destroyed.load(Ordering::SeqCst)
    }

    /// Fires `on_destroy` exactly once, no matter how often the
    /// subscriber is removed.
    pub(crate) fn fire_destroy(&self) {
        if !self.destroyed.swap(true, Ordering::SeqCst) {
            if let Some(hook) = &self.on_destroy {
                hook(&self.name);
            }
        }
    }

    pub(crate) fn fire_create(&self) {
        if let Some(hook) = &self.on_create {
            hook(&self.name);
        }
    }

    pub(crate) fn fire_match(&self, element_type: &str) {
        if let Some(hook) = &self.on_match {
            hook(&self.name, element_type);
        }
    }
}

impl std::fmt::Debug for Interceptor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Interceptor")
            .field("id", &self.id)
            .field("name", &self.name)
            .field("watches", &self.watches)
            .field("auto_clear", &self.auto_clear)
            .field("go_through", &self.go_through)
            .field("is_peek", &self.is_peek)
            .finish()
    }
}
