// Copyright 2026 The Cadence Project
// SPDX-License-Identifier: Apache-2.0

// Native byte bridge — defined in M1.8
//
// The platform layer delivers stream chunks as bundles keyed by stream
// id. Each engine owns one bridge; a bridge buffers bundles only while
// `is_working`, and exposes a resumable byte sequence that yields every
// accumulated chunk, waiting on a notify between chunks. The router is
// an explicit registry owned by the host process and handed to engines,
// not a hidden process-global.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use bytes::Bytes;
use dashmap::DashMap;
use futures_util::Stream;
use tokio::sync::{mpsc, Notify};
use tokio_stream::wrappers::ReceiverStream;

// ---------------------------------------------------------------------------
// Wire types
// ---------------------------------------------------------------------------

/// Terminal signal carried by a bundle. Anything the platform sends
/// other than the two terminal markers is plain data.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BridgeState {
    Data,
    StreamEnd,
    StreamError,
}

impl BridgeState {
    /// Map the platform's state string.
    pub fn from_wire(state: &str) -> Self {
        match state {
            "StreamEnd" => BridgeState::StreamEnd,
            "StreamError" => BridgeState::StreamError,
            _ => BridgeState::Data,
        }
    }
}

/// One platform-layer delivery.
#[derive(Debug, Clone)]
pub struct BridgeBundle {
    pub stream_id: String,
    pub data: Bytes,
    pub state: BridgeState,
}

#[derive(Debug, thiserror::Error, Clone, PartialEq, Eq)]
pub enum BridgeError {
    #[error("stream ended abnormally")]
    AbnormalEnd,
}

// ---------------------------------------------------------------------------
// NativeBridge
// ---------------------------------------------------------------------------

#[derive(Debug, Default)]
struct BufferedStream {
    chunks: Vec<Bytes>,
    is_end: bool,
    is_error: bool,
}

/// Per-engine chunk buffer.
#[derive(Default)]
pub struct NativeBridge {
    working: AtomicBool,
    buffers: DashMap<String, BufferedStream>,
    wake: Notify,
}

impl NativeBridge {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start consuming bundles. Bundles arriving while not working are
    /// dropped, which keeps engines from seeing each other's streams.
    pub fn begin_work(&self) {
        self.working.store(true, Ordering::SeqCst);
    }

    /// Stop consuming and drop every buffer.
    pub fn stop_work(&self) {
        self.working.store(false, Ordering::SeqCst);
        self.buffers.clear();
        self.wake.notify_waiters();
    }

    pub fn is_working(&self) -> bool {
        self.working.load(Ordering::SeqCst)
    }

    /// Accept one bundle from the router.
    pub fn accept(&self, bundle: BridgeBundle) {
        if !self.is_working() {
            return;
        }
        {
            let mut entry = self.buffers.entry(bundle.stream_id.clone()).or_default();
            match bundle.state {
                BridgeState::Data => {
                    if !bundle.data.is_empty() {
                        entry.chunks.push(bundle.data);
                    }
                }
                BridgeState::StreamEnd => entry.is_end = true,
                BridgeState::StreamError => entry.is_error = true,
            }
        }
        self.wake.notify_waiters();
    }

    /// The resumable byte sequence for one stream id: yields each
    /// accumulated chunk in order, waits between chunks, terminates on
    /// the end marker, and raises on the error marker.
    pub fn byte_stream(
        self: &Arc<Self>,
        stream_id: impl Into<String>,
    ) -> impl Stream<Item = Result<Bytes, BridgeError>> + Send + 'static {
        let bridge = self.clone();
        let stream_id = stream_id.into();
        let (tx, rx) = mpsc::channel::<Result<Bytes, BridgeError>>(64);

        tokio::spawn(async move {
            let mut next = 0usize;
            loop {
                let notified = bridge.wake.notified();
                tokio::pin!(notified);
                // Register before re-checking so a concurrent accept is
                // never missed.
                notified.as_mut().enable();

                enum Step {
                    Chunk(Bytes),
                    End,
                    Error,
                    Wait,
                }
                let step = match bridge.buffers.get(&stream_id) {
                    Some(buffer) => {
                        if next < buffer.chunks.len() {
                            Step::Chunk(buffer.chunks[next].clone())
                        } else if buffer.is_error {
                            Step::Error
                        } else if buffer.is_end {
                            Step::End
                        } else {
                            Step::Wait
                        }
                    }
                    None if !bridge.is_working() => Step::End,
                    None => Step::Wait,
                };

                match step {
                    Step::Chunk(chunk) => {
                        next += 1;
                        if tx.send(Ok(chunk)).await.is_err() {
                            return; // Reader dropped
                        }
                    }
                    Step::End => return,
                    Step::Error => {
                        let _ = tx.send(Err(BridgeError::AbnormalEnd)).await;
                        return;
                    }
                    Step::Wait => notified.await,
                }
            }
        });

        ReceiverStream::new(rx)
    }
}

// ---------------------------------------------------------------------------
// BridgeRouter
// ---------------------------------------------------------------------------

/// Fans bundles out to registered bridges. Only working bridges consume,
/// so concurrent engines never cross-talk.
#[derive(Default)]
pub struct BridgeRouter {
    bridges: DashMap<String, Arc<NativeBridge>>,
}

impl BridgeRouter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&self, key: impl Into<String>, bridge: Arc<NativeBridge>) {
        self.bridges.insert(key.into(), bridge);
    }

    pub fn unregister(&self, key: &str) {
        self.bridges.remove(key);
    }

    pub fn dispatch(&self, bundle: BridgeBundle) {
        for entry in self.bridges.iter() {
            if entry.value().is_working() {
                entry.value().accept(bundle.clone());
            }
        }
    }

    pub fn len(&self) -> usize {
        self.bridges.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bridges.is_empty()
    }
}
