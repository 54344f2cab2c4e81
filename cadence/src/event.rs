// Copyright 2026 The Cadence Project
// SPDX-License-Identifier: Apache-2.0

// Internal event representation — defined in M1.1
//
// These are the canonical types that the whole pipeline operates on.
// The frame adapter produces `Vec<Event>`, and every downstream stage
// (filtering, cache admission, interceptor dispatch) consumes them.

use std::collections::HashSet;
use std::sync::OnceLock;
use std::time::Instant;
use uuid::Uuid;

// ---------------------------------------------------------------------------
// Reserved marker identities
// ---------------------------------------------------------------------------

/// Element type of the synthetic event emitted when a stream opens.
pub const STREAM_OPEN_ELEMENT_TYPE: &str = "697";
/// Session log id carried by the stream-open marker.
pub const STREAM_OPEN_LOG_ID: &str = "69602";

/// Element type of the synthetic event emitted at stream end, consumed by
/// the internal auto-remove interceptor to prune stream-scoped subscribers.
pub const AUTO_REMOVE_ELEMENT_TYPE: &str = "699";
/// Session log id carried by the auto-remove marker.
pub const AUTO_REMOVE_LOG_ID: &str = "69603";

// ---------------------------------------------------------------------------
// Event
// ---------------------------------------------------------------------------

/// One decoded SSE payload.
///
/// An event is *legal* iff both `session_log_id` and `element_type` are
/// non-empty. Illegal events never enter a cache; the frame adapter uses
/// [`Event::illegal`] as its sentinel for malformed frames.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Event {
    pub session_log_id: String,
    pub element_type: String,
    /// Text payload. May be empty.
    pub result: String,
    /// Opaque application payload, JSON-encoded on the wire. The core
    /// never parses it.
    pub extra: String,
    pub is_history: bool,
}

impl Event {
    pub fn new(
        session_log_id: impl Into<String>,
        element_type: impl Into<String>,
        result: impl Into<String>,
    ) -> Self {
        Self {
            session_log_id: session_log_id.into(),
            element_type: element_type.into(),
            result: result.into(),
            extra: String::new(),
            is_history: false,
        }
    }

    /// The sentinel produced for frames that fail to decode.
    pub fn illegal() -> Self {
        Self::new("", "", "")
    }

    /// Synthetic marker admitted when the primary stream opens.
    pub fn stream_open() -> Self {
        Self::new(STREAM_OPEN_LOG_ID, STREAM_OPEN_ELEMENT_TYPE, "")
    }

    /// Synthetic marker admitted at stream end to sweep stream-scoped
    /// subscribers.
    pub fn auto_remove() -> Self {
        Self::new(AUTO_REMOVE_LOG_ID, AUTO_REMOVE_ELEMENT_TYPE, "")
    }

    pub fn is_legal(&self) -> bool {
        !self.session_log_id.is_empty() && !self.element_type.is_empty()
    }
}

// ---------------------------------------------------------------------------
// Monotonic admission clock
// ---------------------------------------------------------------------------

static EPOCH: OnceLock<Instant> = OnceLock::new();

/// Microseconds elapsed since a process-local epoch.
///
/// Never wall-clock: the watermark sweep compares these values, and a
/// clock step backwards would expire the wrong entries.
pub fn monotonic_micros() -> u64 {
    EPOCH.get_or_init(Instant::now).elapsed().as_micros() as u64
}

// ---------------------------------------------------------------------------
// CachedEvent
// ---------------------------------------------------------------------------

/// An event admitted to a cache, plus the delivery bookkeeping that the
/// deliverer maintains for it.
///
/// Only the cache deliverer mutates these after admission.
#[derive(Debug, Clone)]
pub struct CachedEvent {
    pub event: Event,
    /// Monotonic admission timestamp, microsecond precision. Watermark
    /// for the auto-remove sweep.
    pub admitted_at_us: u64,
    /// Wall-clock admission time, for logs only.
    pub admitted_at: chrono::DateTime<chrono::Utc>,
    /// Set when a pop reported the entry consumed; removed at the end of
    /// the pacing pass.
    pub is_dirty: bool,
    /// When false, the entry survives the watermark sweep until a
    /// subscriber consumes it explicitly.
    pub auto_remove: bool,
    /// Identities of subscribers already notified for this entry. Guards
    /// the at-most-once delivery invariant.
    pub notified_subscribers: HashSet<Uuid>,
    /// Path of the originating request. May be empty.
    pub req_url: String,
}

impl CachedEvent {
    pub fn new(event: Event, req_url: impl Into<String>) -> Self {
        Self {
            event,
            admitted_at_us: monotonic_micros(),
            admitted_at: chrono::Utc::now(),
            is_dirty: false,
            auto_remove: true,
            notified_subscribers: HashSet::new(),
            req_url: req_url.into(),
        }
    }
}

// ---------------------------------------------------------------------------
// HandlerResponse
// ---------------------------------------------------------------------------

/// The value threaded through an interceptor chain and returned to the
/// dispatching caller.
///
/// `remove_cache = true` is the standard "consume" signal. `auto_remove`
/// is meaningful only while `remove_cache` is false.
#[derive(Debug, Clone)]
pub struct HandlerResponse {
    pub event: Event,
    pub req_url: String,
    pub remove_cache: bool,
    pub auto_remove: bool,
}

impl HandlerResponse {
    /// The response seeded into a chain before the first handler runs.
    pub fn initial(event: Event, req_url: impl Into<String>) -> Self {
        Self {
            event,
            req_url: req_url.into(),
            remove_cache: false,
            auto_remove: true,
        }
    }

    /// Mark the carried event consumed.
    pub fn consumed(mut self) -> Self {
        self.remove_cache = true;
        self
    }
}
