//! # Scheduler
//!
//! Owns the static, compile-time list of cron jobs and fans synthetic
//! events out per tenant and warehouse on each tick. Jobs prefixed
//! `internal:` run in-process against a registered [`InternalJobHandler`]
//! instead of producing an envelope.

mod directory;
mod internal;
mod jobs;
mod scheduler;

pub use directory::TenantDirectory;
pub use internal::InternalJobHandler;
pub use jobs::{default_jobs, JobDefinition, TenantScope};
pub use scheduler::{Scheduler, SchedulerError};
