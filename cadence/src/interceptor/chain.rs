// Copyright 2026 The Cadence Project
// SPDX-License-Identifier: Apache-2.0

use std::sync::Arc;

use uuid::Uuid;

use crate::event::HandlerResponse;
use crate::interceptor::types::Interceptor;

/// Responsibility chain over the matched, ordered subscribers of one
/// dispatch.
///
/// The cursor starts before the first subscriber. A handler keeps the
/// chain alive by calling [`proceed`](Self::proceed) with the response it
/// wants to pass down; returning without calling it terminates normal
/// delivery, after which only go-through subscribers run.
pub struct InterceptorChain {
    subscribers: Vec<Arc<Interceptor>>,
    element_type: String,
    cursor: isize,
    notified: Vec<Arc<Interceptor>>,
}

impl InterceptorChain {
    pub(crate) fn new(subscribers: Vec<Arc<Interceptor>>, element_type: String) -> Self {
        Self {
            subscribers,
            element_type,
            cursor: -1,
            notified: Vec::new(),
        }
    }

    /// Hand the response to the next subscriber.
    ///
    /// Returns the response produced by the rest of the chain (the input
    /// unchanged if no subscriber remains).
    pub fn proceed(&mut self, response: HandlerResponse) -> HandlerResponse {
        self.cursor += 1;
        let idx = self.cursor as usize;
        if idx >= self.subscribers.len() {
            return response;
        }
        let subscriber = self.subscribers[idx].clone();
        subscriber.fire_match(&self.element_type);
        self.notified.push(subscriber.clone());
        let handler = subscriber.handler.clone();
        let response = handler(self, response);
        // Whatever the handler decided, go-through subscribers further
        // down still see the event.
        self.run_go_through(response)
    }

    fn run_go_through(&mut self, mut response: HandlerResponse) -> HandlerResponse {
        loop {
            self.cursor += 1;
            let idx = self.cursor as usize;
            if idx >= self.subscribers.len() {
                return response;
            }
            let subscriber = self.subscribers[idx].clone();
            if !subscriber.go_through {
                continue;
            }
            subscriber.fire_match(&self.element_type);
            self.notified.push(subscriber.clone());
            let handler = subscriber.handler.clone();
            response = handler(self, response);
        }
    }

    /// Identities of every subscriber whose handler ran.
    pub fn notified_ids(&self) -> Vec<Uuid> {
        self.notified.iter().map(|s| s.id).collect()
    }

    pub fn element_type(&self) -> &str {
        &self.element_type
    }
}
