//! # Agent Contract, Registry, and Runtime
//!
//! The harness every reaction handler plugs into. An [`Agent`] declares a
//! name, a description, and the event types it subscribes to; the
//! [`AgentRegistry`] indexes agents by event type; the [`AgentRuntime`]
//! executes the agents subscribed to one inbound envelope with bounded
//! concurrency and a per-agent timeout, and hands the caller every
//! derived envelope those agents produced.
//!
//! This crate never touches the broker. The consumer in
//! `modules/warehouse-engine` owns subscribing to the bus, invoking the
//! runtime, and publishing what it returns.

mod agent;
mod registry;
mod runtime;

pub use agent::{Agent, AgentContext, AgentOutcome, CATCH_ALL};
pub use registry::AgentRegistry;
pub use runtime::{AgentRuntime, RunOutcome, RuntimeConfig};
