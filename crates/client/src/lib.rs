//! Client side of swproxy.
//!
//! This crate provides the network fetcher, the request/response messages,
//! and the worker: lifecycle handlers, routing policies and the registration
//! that swaps worker generations.

pub mod fetch;
pub mod message;
pub mod worker;

pub use fetch::{FetchClient, FetchConfig, Network};
pub use message::{ClientId, Method, Request, RequestMode, Response};
pub use worker::{
    ActivateOutcome, Classifier, DispatchTable, Event, EventKind, InstallOutcome, Outcome, Registration, ServiceWorker,
    Strategy, UpdateOutcome, WorkerContext, WorkerState,
};
