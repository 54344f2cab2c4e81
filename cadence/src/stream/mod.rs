// Copyright 2026 The Cadence Project
// SPDX-License-Identifier: Apache-2.0

// Sentinel framing — defined in M1.3
//
// Responsibilities:
// - Accumulate raw text chunks into a frame buffer
// - Strip `data:` prefixes, `event:stop` tokens, and carriage returns
// - Cut complete frames at the `>s` sentinel and decode them as JSON
// - Hold partial frames across any number of chunks (resumable)
// - Map malformed frames to the illegal-event sentinel, never an error

mod adapter;

pub use adapter::{FrameAdapter, SentinelFrameAdapter, FRAME_SENTINEL};

#[cfg(test)]
mod tests;
