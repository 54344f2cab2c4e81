// Copyright 2026 The Cadence Project
// SPDX-License-Identifier: Apache-2.0

// Connection-state machine — defined in M1.7
//
// Tracks the logical state of the underlying stream and fans state
// changes out to observers in priority order. Non-forced transitions are
// gated; a forced transition always lands.

use std::sync::{Arc, Mutex};

/// Logical connection state of the primary stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    ConnectActive,
    ConnectIdle,
    ConnectException,
    ConnectSuspend,
    DisconnectRepairing,
    DisconnectError,
    DisconnectNormal,
}

impl ConnectionState {
    pub fn is_abnormal(&self) -> bool {
        matches!(
            self,
            ConnectionState::ConnectException | ConnectionState::DisconnectError
        )
    }
}

/// A state observer. Returning `true` from `on_change` halts fan-out to
/// lower-priority observers.
#[derive(Clone)]
pub struct ConnectionObserver {
    pub name: String,
    pub priority: i32,
    pub on_change: Arc<dyn Fn(ConnectionState) -> bool + Send + Sync>,
}

impl ConnectionObserver {
    pub fn new(
        name: impl Into<String>,
        priority: i32,
        on_change: impl Fn(ConnectionState) -> bool + Send + Sync + 'static,
    ) -> Self {
        Self {
            name: name.into(),
            priority,
            on_change: Arc::new(on_change),
        }
    }
}

// ---------------------------------------------------------------------------
// ConnectManager
// ---------------------------------------------------------------------------

pub struct ConnectManager {
    state: Mutex<ConnectionState>,
    observers: Mutex<Vec<ConnectionObserver>>,
}

impl Default for ConnectManager {
    fn default() -> Self {
        Self::new()
    }
}

impl ConnectManager {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(ConnectionState::DisconnectNormal),
            observers: Mutex::new(Vec::new()),
        }
    }

    pub fn state(&self) -> ConnectionState {
        *self.state.lock().unwrap()
    }

    pub fn is_connected(&self) -> bool {
        matches!(
            self.state(),
            ConnectionState::ConnectActive
                | ConnectionState::ConnectIdle
                | ConnectionState::ConnectException
                | ConnectionState::ConnectSuspend
        )
    }

    /// Attempt a transition. Returns whether it was accepted (a no-change
    /// transition is accepted but fires no observers).
    pub fn transition(&self, next: ConnectionState, force: bool) -> bool {
        {
            let mut state = self.state.lock().unwrap();
            if !force && gated(*state, next) {
                tracing::debug!(from = ?*state, to = ?next, "gated transition rejected");
                return false;
            }
            if *state == next {
                return true;
            }
            tracing::debug!(from = ?*state, to = ?next, force, "connection state change");
            *state = next;
        }
        self.fan_out(next);
        true
    }

    fn fan_out(&self, state: ConnectionState) {
        let mut snapshot = self.observers.lock().unwrap().clone();
        // Stable: ties keep registration order.
        snapshot.sort_by(|a, b| b.priority.cmp(&a.priority));
        for observer in snapshot {
            if (observer.on_change)(state) {
                break;
            }
        }
    }

    /// Register an observer, replacing any existing one with the same name.
    pub fn add_observer(&self, observer: ConnectionObserver) {
        let mut observers = self.observers.lock().unwrap();
        observers.retain(|o| o.name != observer.name);
        observers.push(observer);
    }

    /// Remove by identity of the callback, not by name.
    pub fn remove_observer(&self, observer: &ConnectionObserver) {
        let mut observers = self.observers.lock().unwrap();
        observers.retain(|o| !Arc::ptr_eq(&o.on_change, &observer.on_change));
    }

    pub fn observer_count(&self) -> usize {
        self.observers.lock().unwrap().len()
    }
}

/// Non-forced transition gates.
fn gated(from: ConnectionState, to: ConnectionState) -> bool {
    use ConnectionState::*;
    match from {
        ConnectSuspend => matches!(to, ConnectException | ConnectIdle | ConnectActive),
        DisconnectNormal => matches!(to, ConnectException),
        ConnectException | DisconnectError => matches!(to, ConnectIdle),
        _ => false,
    }
}
