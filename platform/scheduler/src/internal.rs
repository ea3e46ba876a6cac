//! Handler contract for `internal:`-prefixed jobs, which run in-process
//! and never produce an envelope (e.g. outbox GC).

use async_trait::async_trait;

#[async_trait]
pub trait InternalJobHandler: Send + Sync {
    /// `job_name` is the bare job name with no `internal:` prefix.
    async fn run(&self, job_name: &str) -> Result<(), String>;
}
