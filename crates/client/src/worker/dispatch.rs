//! Event dispatch.
//!
//! Maps each lifecycle event kind to the handler that serves it. The host
//! hands events to [`DispatchTable::dispatch`]; tests can do the same with
//! nothing but a [`WorkerContext`].

use std::collections::HashMap;
use std::fmt;

use futures_util::FutureExt;
use futures_util::future::BoxFuture;
use serde::Serialize;
use swproxy_core::Error;

use super::WorkerContext;
use super::lifecycle::{self, ActivateOutcome, InstallOutcome};
use super::strategy;
use crate::message::{Request, Response};

/// Event kinds a worker can be asked to handle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum EventKind {
    Install,
    Activate,
    Fetch,
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EventKind::Install => write!(f, "install"),
            EventKind::Activate => write!(f, "activate"),
            EventKind::Fetch => write!(f, "fetch"),
        }
    }
}

/// A lifecycle event with its payload.
#[derive(Debug, Clone)]
pub enum Event {
    Install,
    Activate,
    Fetch(Request),
}

impl Event {
    pub fn kind(&self) -> EventKind {
        match self {
            Event::Install => EventKind::Install,
            Event::Activate => EventKind::Activate,
            Event::Fetch(_) => EventKind::Fetch,
        }
    }
}

/// What a handler produced.
#[derive(Debug)]
pub enum Outcome {
    Installed(InstallOutcome),
    Activated(ActivateOutcome),
    Responded(Response),
}

/// Handler signature stored in the table.
pub type Handler = for<'a> fn(&'a WorkerContext, Event) -> BoxFuture<'a, Result<Outcome, Error>>;

/// Event kind → handler.
#[derive(Clone)]
pub struct DispatchTable {
    handlers: HashMap<EventKind, Handler>,
}

impl DispatchTable {
    /// Table with no handlers registered.
    pub fn empty() -> Self {
        Self { handlers: HashMap::new() }
    }

    /// Register `handler` for `kind`, returning the one it replaces.
    pub fn register(&mut self, kind: EventKind, handler: Handler) -> Option<Handler> {
        self.handlers.insert(kind, handler)
    }

    pub fn handles(&self, kind: EventKind) -> bool {
        self.handlers.contains_key(&kind)
    }

    /// Route `event` to its handler.
    ///
    /// # Errors
    ///
    /// Returns `Error::UnhandledEvent` when no handler is registered for the
    /// event's kind, otherwise whatever the handler returns.
    pub async fn dispatch(&self, ctx: &WorkerContext, event: Event) -> Result<Outcome, Error> {
        let kind = event.kind();
        let handler = self.handlers.get(&kind).ok_or_else(|| Error::UnhandledEvent(kind.to_string()))?;
        handler(ctx, event).await
    }
}

impl Default for DispatchTable {
    fn default() -> Self {
        let mut table = Self::empty();
        table.register(EventKind::Install, on_install);
        table.register(EventKind::Activate, on_activate);
        table.register(EventKind::Fetch, on_fetch);
        table
    }
}

impl fmt::Debug for DispatchTable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_set().entries(self.handlers.keys()).finish()
    }
}

fn on_install(ctx: &WorkerContext, _event: Event) -> BoxFuture<'_, Result<Outcome, Error>> {
    async move { lifecycle::install(ctx).await.map(Outcome::Installed) }.boxed()
}

fn on_activate(ctx: &WorkerContext, _event: Event) -> BoxFuture<'_, Result<Outcome, Error>> {
    async move { lifecycle::activate(ctx).await.map(Outcome::Activated) }.boxed()
}

fn on_fetch(ctx: &WorkerContext, event: Event) -> BoxFuture<'_, Result<Outcome, Error>> {
    async move {
        match event {
            Event::Fetch(request) => strategy::respond(ctx, request).await.map(Outcome::Responded),
            other => Err(Error::UnhandledEvent(format!("fetch handler got {}", other.kind()))),
        }
    }
    .boxed()
}
