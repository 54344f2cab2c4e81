// Copyright 2026 The Cadence Project
// SPDX-License-Identifier: Apache-2.0

// Interceptor registry and responsibility chain — defined in M1.5
//
// Responsibilities:
// - Hold the dynamic set of subscribers, each with watch specs
// - Match subscribers against an event (type + optional content)
// - Order matches by watch priority, ties by registration order
// - Drop subscribers already notified for the cached entry
// - Drive the chain: normal mode until a handler declines to proceed,
//   then go-through mode for the remaining go-through subscribers
// - Sweep stream-scoped subscribers on the auto-remove marker

mod chain;
mod registry;
mod types;

pub use chain::InterceptorChain;
pub use registry::{DispatchOutcome, InterceptorRegistry};
pub use types::{AutoClearStrategy, Handler, Interceptor, WatchSpec};
