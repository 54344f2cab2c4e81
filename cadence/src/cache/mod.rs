// Copyright 2026 The Cadence Project
// SPDX-License-Identifier: Apache-2.0

// Cache pool and paced delivery — defined in M1.6
//
// Responsibilities:
// - Two ordered buffers: the paced main cache and the unpaced peek cache
// - FIFO pop loop with the configured interval applied to selected
//   element types only
// - Cooperative break: checked before each pop and after each delay
// - Reference-counted pause; resuming re-enters the loop
// - Idle detection: a periodic tick comparing the main-cache length
// - Watermark sweep: a consumed pop expires earlier auto-remove entries

mod deliverer;

pub use deliverer::{CacheDeliverer, DelivererState, IdleFn, PopFn, PopVerdict};
