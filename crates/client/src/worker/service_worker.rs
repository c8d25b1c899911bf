//! One worker generation and its lifecycle state.

use std::fmt;
use std::sync::{Mutex, PoisonError};

use serde::Serialize;
use swproxy_core::Error;

use super::WorkerContext;
use super::dispatch::{DispatchTable, Event, Outcome};
use super::lifecycle::{ActivateOutcome, InstallOutcome};
use crate::message::{Request, Response};

/// Lifecycle states of a worker generation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum WorkerState {
    /// Built, nothing run yet.
    Parsed,
    Installing,
    /// Seeded, waiting to be activated.
    Installed,
    Activating,
    /// Controlling pages and answering fetches.
    Activated,
    /// Failed to install or replaced by a newer generation.
    Redundant,
}

impl fmt::Display for WorkerState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            WorkerState::Parsed => "parsed",
            WorkerState::Installing => "installing",
            WorkerState::Installed => "installed",
            WorkerState::Activating => "activating",
            WorkerState::Activated => "activated",
            WorkerState::Redundant => "redundant",
        };
        f.write_str(name)
    }
}

/// A worker generation: context, handlers and state.
#[derive(Debug)]
pub struct ServiceWorker {
    ctx: WorkerContext,
    table: DispatchTable,
    state: Mutex<WorkerState>,
}

impl ServiceWorker {
    pub fn new(ctx: WorkerContext) -> Self {
        Self::with_table(ctx, DispatchTable::default())
    }

    pub fn with_table(ctx: WorkerContext, table: DispatchTable) -> Self {
        Self { ctx, table, state: Mutex::new(WorkerState::Parsed) }
    }

    pub fn context(&self) -> &WorkerContext {
        &self.ctx
    }

    pub fn version(&self) -> &str {
        self.ctx.version()
    }

    pub fn state(&self) -> WorkerState {
        *self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn skip_waiting_requested(&self) -> bool {
        self.ctx.skip_waiting_requested()
    }

    /// Run the install handler. A failure leaves the worker redundant.
    pub async fn install(&self) -> Result<InstallOutcome, Error> {
        self.advance(WorkerState::Parsed, WorkerState::Installing)?;

        match self.table.dispatch(&self.ctx, Event::Install).await {
            Ok(Outcome::Installed(outcome)) => {
                self.set(WorkerState::Installed);
                Ok(outcome)
            }
            Ok(other) => {
                self.set(WorkerState::Redundant);
                Err(Error::UnhandledEvent(format!("install produced {other:?}")))
            }
            Err(e) => {
                self.set(WorkerState::Redundant);
                Err(e)
            }
        }
    }

    /// Run the activate handler. A failure returns the worker to installed.
    pub async fn activate(&self) -> Result<ActivateOutcome, Error> {
        self.advance(WorkerState::Installed, WorkerState::Activating)?;

        match self.table.dispatch(&self.ctx, Event::Activate).await {
            Ok(Outcome::Activated(outcome)) => {
                self.set(WorkerState::Activated);
                Ok(outcome)
            }
            Ok(other) => {
                self.set(WorkerState::Installed);
                Err(Error::UnhandledEvent(format!("activate produced {other:?}")))
            }
            Err(e) => {
                self.set(WorkerState::Installed);
                Err(e)
            }
        }
    }

    /// Answer an intercepted request. Only an activated worker does.
    pub async fn fetch(&self, request: Request) -> Result<Response, Error> {
        let state = self.state();
        if state != WorkerState::Activated {
            return Err(Error::InvalidState { expected: WorkerState::Activated.to_string(), actual: state.to_string() });
        }

        match self.table.dispatch(&self.ctx, Event::Fetch(request)).await? {
            Outcome::Responded(response) => Ok(response),
            other => Err(Error::UnhandledEvent(format!("fetch produced {other:?}"))),
        }
    }

    pub fn mark_redundant(&self) {
        self.set(WorkerState::Redundant);
    }

    fn advance(&self, from: WorkerState, to: WorkerState) -> Result<(), Error> {
        let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        if *state != from {
            return Err(Error::InvalidState { expected: from.to_string(), actual: state.to_string() });
        }
        *state = to;
        Ok(())
    }

    fn set(&self, to: WorkerState) {
        *self.state.lock().unwrap_or_else(PoisonError::into_inner) = to;
    }
}
