//! Reason intake for member reports
//!
//! When a member flags a message, the reporter is asked for a reason and the
//! report waits a bounded time for the answer. The wait never hangs: it ends
//! as [`IntakeResult::TimedOut`] once the timeout elapses.

use async_trait::async_trait;
use std::time::Duration;
use tracing::debug;

use crate::error::Result;

/// Default time a reporter has to explain a report
pub const DEFAULT_INTAKE_TIMEOUT_SECS: u64 = 60;

/// Where report reasons come from (a DM conversation, a modal, a test channel)
#[async_trait]
pub trait ReasonSource: Send + Sync {
    /// Ask the reporter for a reason
    async fn prompt(&self, reporter_id: u64) -> Result<()>;

    /// Wait for the reporter's next reply; `None` when the conversation ended
    async fn next_reply(&self, reporter_id: u64) -> Result<Option<String>>;
}

/// How the intake ended
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IntakeResult {
    /// The reporter answered
    Provided(String),
    /// The reporter answered with nothing usable
    Empty,
    /// No answer within the timeout
    TimedOut,
}

/// Prompt the reporter and wait at most `timeout` for their reason
pub async fn collect_reason(
    source: &dyn ReasonSource,
    reporter_id: u64,
    timeout: Duration,
) -> Result<IntakeResult> {
    source.prompt(reporter_id).await?;

    match tokio::time::timeout(timeout, source.next_reply(reporter_id)).await {
        Ok(reply) => Ok(match reply?.map(|r| r.trim().to_string()) {
            Some(reason) if !reason.is_empty() => IntakeResult::Provided(reason),
            _ => IntakeResult::Empty,
        }),
        Err(_) => {
            debug!(reporter_id, "Reason intake timed out");
            Ok(IntakeResult::TimedOut)
        }
    }
}
