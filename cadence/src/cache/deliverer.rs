// Copyright 2026 The Cadence Project
// SPDX-License-Identifier: Apache-2.0

use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, AtomicI64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex as StdMutex};
use std::time::Duration;

use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use uuid::Uuid;

use crate::event::{CachedEvent, Event};

/// What one pop reported back to the deliverer.
#[derive(Debug, Default)]
pub struct PopVerdict {
    /// The entry was consumed and should be removed with this pass.
    pub is_consumed: bool,
    /// Whether the entry may be expired by the watermark sweep.
    pub auto_remove: bool,
    /// Subscriber identities notified during this pop.
    pub notified: Vec<Uuid>,
}

/// Caller-supplied pop callback. Synchronous relative to the pacing
/// loop: the interval delay is the only suspension point per iteration.
pub type PopFn = Arc<dyn Fn(&CachedEvent) -> PopVerdict + Send + Sync>;

/// Idle observer, invoked when the main cache length did not change
/// across one checker tick.
pub type IdleFn = Arc<dyn Fn() + Send + Sync>;

/// Delivery state. Active iff the pause count is zero.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DelivererState {
    Active,
    Pause,
}

// ---------------------------------------------------------------------------
// CacheDeliverer
// ---------------------------------------------------------------------------

/// The dual cache pool.
///
/// Each cache sits behind its own FIFO mutex region; put/flush/clear
/// queue through it and the pacing loop runs inside it, so concurrent
/// puts serialize in arrival order. `break_loop`, the pause counter, and
/// the shutdown flag are atomics, reachable without the region lock.
pub struct CacheDeliverer {
    main: Mutex<Vec<CachedEvent>>,
    peek: Mutex<Vec<CachedEvent>>,
    break_loop: AtomicBool,
    can_run_locked_task: AtomicBool,
    pause_count: AtomicI64,
    extract_interval: StdMutex<Duration>,
    paced_types: HashSet<String>,
    stored_pop: StdMutex<Option<PopFn>>,
    idle_observer: StdMutex<Option<IdleFn>>,
    idle_len: AtomicUsize,
    idle_task: StdMutex<Option<JoinHandle<()>>>,
}

impl CacheDeliverer {
    pub fn new(extract_interval: Duration, paced_types: HashSet<String>) -> Self {
        Self {
            main: Mutex::new(Vec::new()),
            peek: Mutex::new(Vec::new()),
            break_loop: AtomicBool::new(false),
            can_run_locked_task: AtomicBool::new(true),
            pause_count: AtomicI64::new(0),
            extract_interval: StdMutex::new(extract_interval),
            paced_types,
            stored_pop: StdMutex::new(None),
            idle_observer: StdMutex::new(None),
            idle_len: AtomicUsize::new(0),
            idle_task: StdMutex::new(None),
        }
    }

    // -----------------------------------------------------------------------
    // Admission
    // -----------------------------------------------------------------------

    /// Append wrapped entries to the main cache, then run the pacing loop.
    pub async fn put(&self, events: Vec<Event>, req_url: &str, pop: PopFn) {
        if !self.can_run_locked_task.load(Ordering::SeqCst) {
            return;
        }
        *self.stored_pop.lock().unwrap() = Some(pop.clone());
        let mut main = self.main.lock().await;
        for event in events {
            main.push(CachedEvent::new(event, req_url));
        }
        self.run_loop(&mut main, &pop).await;
    }

    /// Append wrapped entries to the peek cache. No delivery happens here.
    pub async fn put_peek(&self, events: Vec<Event>, req_url: &str) {
        if !self.can_run_locked_task.load(Ordering::SeqCst) {
            return;
        }
        let mut peek = self.peek.lock().await;
        for event in events {
            peek.push(CachedEvent::new(event, req_url));
        }
    }

    // -----------------------------------------------------------------------
    // Flushing
    // -----------------------------------------------------------------------

    /// Re-enter the pacing loop on current main-cache content. With
    /// `break_current`, a loop already running is signalled to stop so
    /// this flush's own iteration runs next.
    pub async fn flush(&self, pop: PopFn, break_current: bool) {
        if !self.can_run_locked_task.load(Ordering::SeqCst) {
            return;
        }
        if break_current {
            self.break_loop.store(true, Ordering::SeqCst);
        }
        *self.stored_pop.lock().unwrap() = Some(pop.clone());
        let mut main = self.main.lock().await;
        self.run_loop(&mut main, &pop).await;
    }

    /// Pop every peek entry synchronously: no pacing, no removal. Each
    /// entry's notified set is merged so repeated flushes never deliver
    /// to the same subscriber twice.
    pub async fn flush_peek(&self, pop: PopFn) {
        if !self.can_run_locked_task.load(Ordering::SeqCst) {
            return;
        }
        let mut peek = self.peek.lock().await;
        for entry in peek.iter_mut() {
            let verdict = pop(entry);
            entry.notified_subscribers.extend(verdict.notified);
        }
    }

    // -----------------------------------------------------------------------
    // Mutation
    // -----------------------------------------------------------------------

    /// Break the running loop, drop entries matching the predicate, and
    /// insert the replacement at the head of the main cache.
    pub async fn replace<F>(&self, predicate: F, event: Event, req_url: &str)
    where
        F: Fn(&CachedEvent) -> bool,
    {
        if !self.can_run_locked_task.load(Ordering::SeqCst) {
            return;
        }
        self.break_loop.store(true, Ordering::SeqCst);
        let mut main = self.main.lock().await;
        main.retain(|entry| !predicate(entry));
        main.insert(0, CachedEvent::new(event, req_url));
    }

    /// Break the loop, refuse further locked work, and empty both caches.
    pub async fn clear_cache(&self) {
        self.break_loop.store(true, Ordering::SeqCst);
        self.can_run_locked_task.store(false, Ordering::SeqCst);
        self.main.lock().await.clear();
        self.peek.lock().await.clear();
    }

    /// Empty both caches and accept work again. Called when a new stream
    /// response arrives.
    pub async fn reset(&self) {
        self.clear_cache().await;
        self.break_loop.store(false, Ordering::SeqCst);
        self.can_run_locked_task.store(true, Ordering::SeqCst);
    }

    /// Full teardown: clear caches, stop the idle checker, drop the
    /// remembered pop and observer. Idempotent.
    pub async fn destroy(&self) {
        self.clear_cache().await;
        self.stop_idle_checker();
        *self.stored_pop.lock().unwrap() = None;
        *self.idle_observer.lock().unwrap() = None;
    }

    // -----------------------------------------------------------------------
    // Pause / resume
    // -----------------------------------------------------------------------

    /// Reference-counted pause. `force` zeroes the counter and imposes
    /// the state directly. Pausing cancels the idle checker; returning
    /// to active restarts it and re-enters the pacing loop with the
    /// remembered pop callback.
    pub async fn set_state(self: &Arc<Self>, state: DelivererState, force: bool) {
        match state {
            DelivererState::Pause => {
                if force {
                    self.pause_count.store(1, Ordering::SeqCst);
                } else {
                    self.pause_count.fetch_add(1, Ordering::SeqCst);
                }
                self.stop_idle_checker();
            }
            DelivererState::Active => {
                if force {
                    self.pause_count.store(0, Ordering::SeqCst);
                } else {
                    let _ = self
                        .pause_count
                        .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |count| {
                            Some((count - 1).max(0))
                        });
                }
                if self.state() == DelivererState::Active {
                    self.start_idle_checker();
                    let pop = self.stored_pop.lock().unwrap().clone();
                    if let Some(pop) = pop {
                        let mut main = self.main.lock().await;
                        self.run_loop(&mut main, &pop).await;
                    }
                }
            }
        }
    }

    pub fn state(&self) -> DelivererState {
        if self.pause_count.load(Ordering::SeqCst) == 0 {
            DelivererState::Active
        } else {
            DelivererState::Pause
        }
    }

    pub fn pause_count(&self) -> i64 {
        self.pause_count.load(Ordering::SeqCst)
    }

    // -----------------------------------------------------------------------
    // Pacing interval
    // -----------------------------------------------------------------------

    pub fn extract_interval(&self) -> Duration {
        *self.extract_interval.lock().unwrap()
    }

    pub fn set_extract_interval(&self, interval: Duration) {
        *self.extract_interval.lock().unwrap() = interval;
    }

    // -----------------------------------------------------------------------
    // Idle detection
    // -----------------------------------------------------------------------

    /// Install the idle observer and (re)start the checker task.
    pub fn set_idle_observer(self: &Arc<Self>, observer: IdleFn) {
        *self.idle_observer.lock().unwrap() = Some(observer);
        self.start_idle_checker();
    }

    fn start_idle_checker(self: &Arc<Self>) {
        self.stop_idle_checker();
        if self.idle_observer.lock().unwrap().is_none() {
            return;
        }
        let weak = Arc::downgrade(self);
        let handle = tokio::spawn(async move {
            loop {
                let interval = match weak.upgrade() {
                    Some(deliverer) => deliverer.extract_interval(),
                    None => return,
                };
                tokio::time::sleep(interval).await;

                let Some(deliverer) = weak.upgrade() else {
                    return;
                };
                if deliverer.state() == DelivererState::Pause {
                    continue;
                }
                let len = deliverer.main.lock().await.len();
                let last = deliverer.idle_len.swap(len, Ordering::SeqCst);
                if len > 0 && len == last {
                    let observer = deliverer.idle_observer.lock().unwrap().clone();
                    if let Some(observer) = observer {
                        observer();
                    }
                }
            }
        });
        *self.idle_task.lock().unwrap() = Some(handle);
    }

    fn stop_idle_checker(&self) {
        if let Some(handle) = self.idle_task.lock().unwrap().take() {
            handle.abort();
        }
    }

    // -----------------------------------------------------------------------
    // Introspection (tests and idle supervision)
    // -----------------------------------------------------------------------

    pub async fn main_len(&self) -> usize {
        self.main.lock().await.len()
    }

    pub async fn peek_len(&self) -> usize {
        self.peek.lock().await.len()
    }

    // -----------------------------------------------------------------------
    // Pacing loop
    // -----------------------------------------------------------------------

    /// One pass over the main cache, in admission order.
    ///
    /// Runs inside the main-cache region; the interval delay is the only
    /// suspension point per iteration. A pop reporting consumption marks
    /// its entry dirty and sweeps earlier auto-remove entries at or below
    /// the consumed admission timestamp; dirty entries are removed when
    /// the pass ends, however it ends.
    async fn run_loop(&self, cache: &mut Vec<CachedEvent>, pop: &PopFn) {
        if !self.can_run_locked_task.load(Ordering::SeqCst) {
            return;
        }
        self.break_loop.store(false, Ordering::SeqCst);

        let mut idx = 0;
        while idx < cache.len() {
            if self.break_loop.load(Ordering::SeqCst) {
                break;
            }
            if self.state() == DelivererState::Pause {
                // Entries stay for the resume pass.
                break;
            }
            if cache[idx].is_dirty {
                idx += 1;
                continue;
            }

            let verdict = pop(&cache[idx]);
            let admitted_at_us = cache[idx].admitted_at_us;
            {
                let entry = &mut cache[idx];
                entry.is_dirty = verdict.is_consumed;
                entry.auto_remove = verdict.auto_remove;
                entry.notified_subscribers.extend(verdict.notified);
            }
            if verdict.is_consumed {
                let mut swept = 0usize;
                for earlier in cache[..idx].iter_mut() {
                    if earlier.auto_remove
                        && !earlier.is_dirty
                        && earlier.admitted_at_us <= admitted_at_us
                    {
                        earlier.is_dirty = true;
                        swept += 1;
                    }
                }
                if swept > 0 {
                    tracing::debug!(swept, "watermark sweep expired earlier entries");
                }
            }

            let paced = self.paced_types.contains(&cache[idx].event.element_type);
            idx += 1;
            if paced {
                tokio::time::sleep(self.extract_interval()).await;
                if self.break_loop.load(Ordering::SeqCst) {
                    break;
                }
            }
        }

        cache.retain(|entry| !entry.is_dirty);
        self.idle_len.store(cache.len(), Ordering::SeqCst);
    }
}
