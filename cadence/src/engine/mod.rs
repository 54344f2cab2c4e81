// Copyright 2026 The Cadence Project
// SPDX-License-Identifier: Apache-2.0

// Engine integration -- defined in M1.10
//
// Wires the pipeline together for the primary stream and agent streams:
// - Install as request/response/error interceptor on the transport
// - Gate: one primary stream at a time
// - Frame incoming chunks, expand through filters, admit to both caches
// - Pop callback: dispatch through the registry, consume on removeCache
// - Synthesize stream-open and auto-remove markers
// - Idle/exception supervision off the deliverer's idle checker
// - Fast-deliver interval override, agent side-streams, full teardown

use std::pin::Pin;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex as StdMutex, OnceLock, Weak};
use std::time::Duration;

use bytes::Bytes;
use dashmap::DashMap;
use futures_util::{Stream, StreamExt};
use tokio::task::JoinHandle;
use uuid::Uuid;

use crate::bridge::{BridgeError, BridgeRouter, NativeBridge};
use crate::cache::{CacheDeliverer, DelivererState, PopFn, PopVerdict};
use crate::client::{
    RequestDirective, RequestError, RequestInterceptor, SseHttpClient, StreamRequest,
    StreamResponse,
};
use crate::config::Config;
use crate::connect::{ConnectManager, ConnectionState};
use crate::event::{monotonic_micros, CachedEvent, Event};
use crate::filter::{EventFilter, FilterService};
use crate::interceptor::{AutoClearStrategy, Interceptor, InterceptorRegistry, WatchSpec};
use crate::stream::{FrameAdapter, SentinelFrameAdapter};

/// Name of the internal subscriber that consumes the auto-remove marker.
pub const AUTO_REMOVE_INTERCEPTOR: &str = "__cadence_auto_remove";
/// It must run before any application subscriber on the marker.
const AUTO_REMOVE_PRIORITY: i32 = 10_000;

/// Interval imposed while fast-deliver is enabled.
pub const FAST_DELIVER_INTERVAL: Duration = Duration::from_millis(10);

type ReaderStream = Pin<Box<dyn Stream<Item = Result<Bytes, BridgeError>> + Send>>;

// ---------------------------------------------------------------------------
// Dependencies
// ---------------------------------------------------------------------------

/// Everything the engine needs injected. The transport and router are
/// owned by the caller; the engine registers itself on both and removes
/// itself completely on destroy.
pub struct EngineDeps {
    pub config: Arc<Config>,
    pub client: Arc<dyn SseHttpClient>,
    pub router: Arc<BridgeRouter>,
    /// Permanent filter slot, applied when no transitory filter is set.
    pub sse_filter: Option<Arc<dyn EventFilter>>,
    /// Replacement framing. Defaults to the sentinel adapter.
    pub adapter: Option<Box<dyn FrameAdapter>>,
}

// ---------------------------------------------------------------------------
// Options for agent streams
// ---------------------------------------------------------------------------

/// How an agent side-stream feeds its events in.
#[derive(Debug, Clone, Copy)]
pub struct AgentStreamOptions {
    /// Admit through the cache pool (paced) instead of dispatching
    /// straight to the registry.
    pub use_cache_pool: bool,
    /// Also admit to the peek cache. Only meaningful with the pool.
    pub with_peek: bool,
    /// Forget the agent when its stream ends.
    pub remove_agent_on_end: bool,
}

impl Default for AgentStreamOptions {
    fn default() -> Self {
        Self {
            use_cache_pool: true,
            with_peek: false,
            remove_agent_on_end: true,
        }
    }
}

// ---------------------------------------------------------------------------
// Engine
// ---------------------------------------------------------------------------

pub struct Engine {
    name: String,
    config: Arc<Config>,
    client: Arc<dyn SseHttpClient>,
    router: Arc<BridgeRouter>,
    bridge: Arc<NativeBridge>,
    deliverer: Arc<CacheDeliverer>,
    registry: Arc<InterceptorRegistry>,
    connect: Arc<ConnectManager>,
    filters: Arc<FilterService>,
    adapter: StdMutex<Box<dyn FrameAdapter>>,
    stream_transforming: AtomicBool,
    last_active_us: Arc<AtomicU64>,
    current_req_url: StdMutex<String>,
    saved_interval: StdMutex<Option<Duration>>,
    agents: DashMap<String, JoinHandle<()>>,
    destroyed: AtomicBool,
    self_ref: OnceLock<Weak<Engine>>,
}

impl Engine {
    /// Build the engine, register the internal auto-remove subscriber,
    /// attach the bridge to the router, and install the engine on the
    /// transport.
    pub fn init(deps: EngineDeps) -> Arc<Self> {
        let config = deps.config;
        let deliverer = Arc::new(CacheDeliverer::new(
            config.extract_interval,
            config.paced_element_types.clone(),
        ));
        let registry = Arc::new(InterceptorRegistry::new());
        let bridge = Arc::new(NativeBridge::new());
        let name = format!("cadence-engine-{}", Uuid::new_v4());

        let engine = Arc::new(Self {
            name,
            client: deps.client,
            router: deps.router,
            bridge: bridge.clone(),
            deliverer,
            registry: registry.clone(),
            connect: Arc::new(ConnectManager::new()),
            filters: Arc::new(FilterService::new(deps.sse_filter)),
            adapter: StdMutex::new(
                deps.adapter
                    .unwrap_or_else(|| Box::new(SentinelFrameAdapter::new())),
            ),
            stream_transforming: AtomicBool::new(false),
            last_active_us: Arc::new(AtomicU64::new(monotonic_micros())),
            current_req_url: StdMutex::new(String::new()),
            saved_interval: StdMutex::new(None),
            agents: DashMap::new(),
            destroyed: AtomicBool::new(false),
            self_ref: OnceLock::new(),
            config,
        });
        let _ = engine.self_ref.set(Arc::downgrade(&engine));

        let sweeper = {
            let registry = Arc::downgrade(&registry);
            Interceptor::new(AUTO_REMOVE_INTERCEPTOR, move |_chain, response| {
                if let Some(registry) = registry.upgrade() {
                    registry.remove_stream_scoped();
                }
                response.consumed()
            })
            .watch(WatchSpec::new(
                crate::event::AUTO_REMOVE_ELEMENT_TYPE,
                AUTO_REMOVE_PRIORITY,
            ))
            .peek(true)
            .auto_clear(AutoClearStrategy::Round)
        };
        engine.registry.add(Arc::new(sweeper), true);

        engine.router.register(&engine.name, bridge);
        engine.client.install(engine.clone());

        tracing::info!(tag = %engine.config.debug_tag, name = %engine.name, "engine initialized");
        engine
    }

    // -----------------------------------------------------------------------
    // Component access
    // -----------------------------------------------------------------------

    pub fn registry(&self) -> &Arc<InterceptorRegistry> {
        &self.registry
    }

    pub fn connect(&self) -> &Arc<ConnectManager> {
        &self.connect
    }

    pub fn deliverer(&self) -> &Arc<CacheDeliverer> {
        &self.deliverer
    }

    pub fn filters(&self) -> &Arc<FilterService> {
        &self.filters
    }

    pub fn bridge(&self) -> &Arc<NativeBridge> {
        &self.bridge
    }

    pub fn config(&self) -> &Arc<Config> {
        &self.config
    }

    pub fn is_stream_transforming(&self) -> bool {
        self.stream_transforming.load(Ordering::SeqCst)
    }

    // -----------------------------------------------------------------------
    // Fast deliver
    // -----------------------------------------------------------------------

    /// Drop the pacing interval to drain a backlog quickly. Idempotent
    /// until disabled.
    pub fn enable_fast_deliver(&self) {
        let mut saved = self.saved_interval.lock().unwrap();
        if saved.is_none() {
            *saved = Some(self.deliverer.extract_interval());
            self.deliverer.set_extract_interval(FAST_DELIVER_INTERVAL);
            tracing::debug!(tag = %self.config.debug_tag, "fast deliver enabled");
        }
    }

    /// Restore the interval saved by `enable_fast_deliver`.
    pub fn disable_fast_deliver(&self) {
        if let Some(interval) = self.saved_interval.lock().unwrap().take() {
            self.deliverer.set_extract_interval(interval);
            tracing::debug!(tag = %self.config.debug_tag, "fast deliver disabled");
        }
    }

    // -----------------------------------------------------------------------
    // Agent streams
    // -----------------------------------------------------------------------

    /// Attach a named side-stream the caller owns. Its events run
    /// through the filter service and are admitted per the options; on
    /// stream end the auto-remove marker is synthesized so stream-scoped
    /// subscribers are swept.
    pub fn open_agent_stream(
        self: &Arc<Self>,
        key: impl Into<String>,
        events: impl Stream<Item = Event> + Send + 'static,
        options: AgentStreamOptions,
    ) {
        let key = key.into();
        let engine = self.clone();
        let task_key = key.clone();
        let handle = tokio::spawn(async move {
            tokio::pin!(events);
            while let Some(event) = events.next().await {
                let expanded = engine.filters.resolve(event).await;
                if options.use_cache_pool {
                    engine.admit(expanded, options.with_peek).await;
                } else {
                    for event in expanded.into_iter().filter(|e| e.is_legal()) {
                        let entry = CachedEvent::new(event, "");
                        engine.registry.deliver(&entry, false);
                    }
                }
            }

            let markers: Vec<Event> = engine
                .filters
                .resolve(Event::auto_remove())
                .await
                .into_iter()
                .filter(|e| e.is_legal())
                .collect();
            engine.deliverer.put_peek(markers, "").await;
            engine.deliverer.flush_peek(engine.peek_pop()).await;

            if options.remove_agent_on_end {
                engine.agents.remove(&task_key);
            }
            tracing::debug!(tag = %engine.config.debug_tag, agent = %task_key, "agent stream finished");
        });

        if let Some(previous) = self.agents.insert(key, handle) {
            previous.abort();
        }
    }

    pub fn close_agent_stream(&self, key: &str) {
        if let Some((_, handle)) = self.agents.remove(key) {
            handle.abort();
        }
    }

    pub fn has_agent_stream(&self, key: &str) -> bool {
        self.agents.contains_key(key)
    }

    // -----------------------------------------------------------------------
    // Teardown
    // -----------------------------------------------------------------------

    /// Full teardown. Removes the engine from the transport and the
    /// router completely. Idempotent.
    pub async fn destroy(&self) {
        if self.destroyed.swap(true, Ordering::SeqCst) {
            return;
        }
        self.client.uninstall(&self.name);
        self.router.unregister(&self.name);
        self.bridge.stop_work();
        for entry in self.agents.iter() {
            entry.value().abort();
        }
        self.agents.clear();
        self.registry.destroy();
        self.filters.destroy();
        self.deliverer.destroy().await;
        tracing::info!(tag = %self.config.debug_tag, name = %self.name, "engine destroyed");
    }

    // -----------------------------------------------------------------------
    // Admission and pops
    // -----------------------------------------------------------------------

    /// Drop illegal events, then admit: peek first (with an immediate
    /// unpaced flush so peek subscribers lead paced delivery), then the
    /// main cache with the paced pop.
    async fn admit(&self, events: Vec<Event>, with_peek: bool) {
        let (legal, illegal): (Vec<Event>, Vec<Event>) =
            events.into_iter().partition(|e| e.is_legal());
        if !illegal.is_empty() {
            tracing::debug!(
                tag = %self.config.debug_tag,
                dropped = illegal.len(),
                "illegal events dropped before admission"
            );
        }
        if legal.is_empty() {
            return;
        }
        let req_url = self.current_req_url.lock().unwrap().clone();
        if with_peek {
            self.deliverer.put_peek(legal.clone(), &req_url).await;
            self.deliverer.flush_peek(self.peek_pop()).await;
        }
        self.deliverer.put(legal, &req_url, self.main_pop()).await;
    }

    fn main_pop(&self) -> PopFn {
        let registry = self.registry.clone();
        let connect = self.connect.clone();
        let last_active = self.last_active_us.clone();
        Arc::new(move |entry: &CachedEvent| {
            let outcome = registry.deliver(entry, false);
            if outcome.response.remove_cache {
                connect.transition(ConnectionState::ConnectActive, false);
                last_active.store(monotonic_micros(), Ordering::SeqCst);
            }
            PopVerdict {
                is_consumed: outcome.response.remove_cache,
                auto_remove: outcome.response.auto_remove,
                notified: outcome.notified,
            }
        })
    }

    fn peek_pop(&self) -> PopFn {
        let registry = self.registry.clone();
        Arc::new(move |entry: &CachedEvent| {
            let outcome = registry.deliver(entry, true);
            PopVerdict {
                is_consumed: outcome.response.remove_cache,
                auto_remove: outcome.response.auto_remove,
                notified: outcome.notified,
            }
        })
    }

    // -----------------------------------------------------------------------
    // Stream consumption
    // -----------------------------------------------------------------------

    async fn consume(self: Arc<Self>, mut reader: ReaderStream) {
        let opened = self.filters.resolve(Event::stream_open()).await;
        self.admit(opened, true).await;

        loop {
            match reader.next().await {
                Some(Ok(chunk)) => {
                    let text = String::from_utf8_lossy(&chunk).to_string();
                    let events = { self.adapter.lock().unwrap().feed(&text) };
                    for event in events {
                        let expanded = self.filters.resolve(event).await;
                        self.admit(expanded, true).await;
                    }
                }
                Some(Err(error)) => {
                    tracing::warn!(tag = %self.config.debug_tag, %error, "stream raised");
                    self.finish_stream(true).await;
                    return;
                }
                None => {
                    self.finish_stream(false).await;
                    return;
                }
            }
        }
    }

    /// Common tail of stream done and stream error.
    async fn finish_stream(&self, is_error: bool) {
        let markers: Vec<Event> = self
            .filters
            .resolve(Event::auto_remove())
            .await
            .into_iter()
            .filter(|e| e.is_legal())
            .collect();
        let req_url = self.current_req_url.lock().unwrap().clone();
        self.deliverer.put_peek(markers, &req_url).await;

        self.stream_transforming.store(false, Ordering::SeqCst);
        let next = if is_error {
            ConnectionState::DisconnectError
        } else {
            ConnectionState::ConnectSuspend
        };
        self.connect.transition(next, false);

        self.deliverer.flush_peek(self.peek_pop()).await;
        self.filters.reset();
        self.bridge.stop_work();
        tracing::info!(tag = %self.config.debug_tag, error = is_error, "stream finished");
    }

    // -----------------------------------------------------------------------
    // Idle supervision
    // -----------------------------------------------------------------------

    fn install_idle_observer(&self) {
        let Some(weak) = self.self_ref.get().cloned() else {
            return;
        };
        self.deliverer.set_idle_observer(Arc::new(move || {
            if let Some(engine) = weak.upgrade() {
                engine.on_idle_tick();
            }
        }));
    }

    fn on_idle_tick(&self) {
        if self.deliverer.state() == DelivererState::Pause {
            return;
        }
        let quiet = Duration::from_micros(
            monotonic_micros().saturating_sub(self.last_active_us.load(Ordering::SeqCst)),
        );
        if quiet > self.config.exception_timeout {
            self.connect
                .transition(ConnectionState::ConnectException, false);
        } else if quiet > self.config.idle_timeout {
            self.connect.transition(ConnectionState::ConnectIdle, false);
        }
    }
}

// ---------------------------------------------------------------------------
// Transport hooks
// ---------------------------------------------------------------------------

#[async_trait::async_trait]
impl RequestInterceptor for Engine {
    fn name(&self) -> &str {
        &self.name
    }

    async fn on_request(
        &self,
        request: StreamRequest,
    ) -> Result<RequestDirective, RequestError> {
        if request.is_sse() {
            if self.stream_transforming.swap(true, Ordering::SeqCst) {
                tracing::warn!(
                    tag = %self.config.debug_tag,
                    path = %request.path,
                    "SSE request rejected: a stream is already transforming"
                );
                return Err(RequestError::TransformingInProgress);
            }
            self.bridge.begin_work();
            if self.config.checks_connect_state(&request.path) {
                self.install_idle_observer();
            }
            self.last_active_us
                .store(monotonic_micros(), Ordering::SeqCst);
            self.connect
                .transition(ConnectionState::DisconnectNormal, true);
            tracing::info!(
                tag = %self.config.debug_tag,
                path = %request.path,
                stream_id = %request.id,
                "SSE stream opening"
            );
        }
        if request.is_offline() {
            return Ok(RequestDirective::Respond(StreamResponse::synthetic_ok()));
        }
        Ok(RequestDirective::Proceed(request))
    }

    async fn on_response(
        &self,
        request: &StreamRequest,
        mut response: StreamResponse,
    ) -> StreamResponse {
        if !request.is_sse() {
            return response;
        }

        let reader: ReaderStream = if let Some(provider) = &request.offline_provider {
            Box::pin(provider.body().await.map(Ok))
        } else if let Some(body) = response.body.take() {
            Box::pin(body.map(Ok))
        } else {
            Box::pin(self.bridge.byte_stream(request.id.clone()))
        };

        self.deliverer.reset().await;
        self.adapter.lock().unwrap().reset();
        *self.current_req_url.lock().unwrap() = request.path.clone();

        if let Some(engine) = self.self_ref.get().and_then(Weak::upgrade) {
            tokio::spawn(engine.consume(reader));
        }
        response
    }

    async fn on_error(&self, request: &StreamRequest, error: &RequestError) {
        if error.is_transforming_marker() {
            return;
        }
        tracing::warn!(
            tag = %self.config.debug_tag,
            path = %request.path,
            %error,
            "transport error"
        );
        self.connect
            .transition(ConnectionState::DisconnectError, false);
        if request.is_sse() {
            self.stream_transforming.store(false, Ordering::SeqCst);
        }
    }
}
