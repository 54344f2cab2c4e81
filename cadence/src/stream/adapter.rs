// Copyright 2026 The Cadence Project
// SPDX-License-Identifier: Apache-2.0

use serde::Deserialize;

use crate::event::Event;

/// Frame terminator. Everything before it is one JSON payload.
pub const FRAME_SENTINEL: &str = ">s";

const DATA_PREFIX: &str = "data:";
const STOP_TOKEN: &str = "event:stop";

// ---------------------------------------------------------------------------
// Trait: FrameAdapter
// ---------------------------------------------------------------------------

/// Converts a lazy text-chunk sequence into structured events.
///
/// Implementations must be resumable across chunks: a frame may straddle
/// any number of `feed` calls, and a call that completes no frame returns
/// an empty vector. Callers may swap in their own adapter as long as the
/// emit-on-complete-frame property holds.
pub trait FrameAdapter: Send {
    /// Feed one raw text chunk; returns every event completed by it.
    fn feed(&mut self, chunk: &str) -> Vec<Event>;

    /// Drop any partially accumulated frame.
    fn reset(&mut self);
}

// ---------------------------------------------------------------------------
// Default adapter
// ---------------------------------------------------------------------------

/// The default sentinel-framed adapter.
///
/// Each chunk is split at newline boundaries (leading whitespace on the
/// following line belongs to the boundary), transport tokens are stripped
/// per line, and surviving text is appended to an internal accumulator.
/// The accumulator is then cut at each `>s` occurrence and the prefix
/// decoded as a JSON frame.
#[derive(Debug, Default)]
pub struct SentinelFrameAdapter {
    buffer: String,
}

impl SentinelFrameAdapter {
    pub fn new() -> Self {
        Self::default()
    }

    fn drain_frames(&mut self) -> Vec<Event> {
        let mut events = Vec::new();
        'frames: loop {
            let mut search_from = 0;
            loop {
                let pos = match self.buffer[search_from..].find(FRAME_SENTINEL) {
                    Some(rel) => search_from + rel,
                    // No terminator left: the buffer holds at most a
                    // partial frame. Wait for more bytes.
                    None => break 'frames,
                };
                // Residual `data:` tokens can survive when a frame body
                // itself straddled a transport chunk boundary.
                let payload = self.buffer[..pos].replace(DATA_PREFIX, "");
                let event = decode_frame(&payload);
                if event.is_legal() {
                    self.buffer.drain(..pos + FRAME_SENTINEL.len());
                    events.push(event);
                    continue 'frames;
                }
                // The sentinel can sit inside an unterminated JSON string;
                // the real terminator is a later occurrence.
                search_from = pos + FRAME_SENTINEL.len();
            }
        }
        events
    }
}

impl FrameAdapter for SentinelFrameAdapter {
    fn feed(&mut self, chunk: &str) -> Vec<Event> {
        for line in chunk.split('\n') {
            let line = line.trim_start();
            let line = line.strip_prefix(DATA_PREFIX).unwrap_or(line);
            let cleaned: String = line
                .replace(STOP_TOKEN, "")
                .chars()
                .filter(|c| *c != '\r')
                .collect();
            if cleaned.trim().is_empty() {
                continue;
            }
            self.buffer.push_str(&cleaned);
        }
        self.drain_frames()
    }

    fn reset(&mut self) {
        self.buffer.clear();
    }
}

// ---------------------------------------------------------------------------
// Frame decoding
// ---------------------------------------------------------------------------

/// Wire shape of one frame. Missing fields decode to empty/false.
#[derive(Deserialize)]
struct RawFrame {
    #[serde(rename = "elementType", default)]
    element_type: String,
    #[serde(rename = "sessionLogId", default)]
    session_log_id: String,
    #[serde(default)]
    result: String,
    /// Arbitrary JSON; re-encoded as a string and carried opaquely.
    #[serde(default)]
    extra: serde_json::Value,
    #[serde(rename = "isHistory", default)]
    is_history: bool,
}

fn decode_frame(payload: &str) -> Event {
    let raw: RawFrame = match serde_json::from_str(payload.trim()) {
        Ok(raw) => raw,
        Err(_) => return Event::illegal(),
    };
    let extra = match raw.extra {
        serde_json::Value::Null => String::new(),
        other => other.to_string(),
    };
    Event {
        session_log_id: raw.session_log_id,
        element_type: raw.element_type,
        result: raw.result,
        extra,
        is_history: raw.is_history,
    }
}
