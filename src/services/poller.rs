use std::future::Future;
use std::time::Duration;
use tokio::time::sleep;

use crate::services::generator::{GeneratorError, RemoteState};

/// Fixed-delay, bounded-attempt polling parameters. Both values come from
/// configuration rather than constants.
#[derive(Debug, Clone, Copy)]
pub struct PollPolicy {
    pub interval: Duration,
    pub max_attempts: u32,
}

/// Repeatedly query a remote resource until it reaches a terminal state.
///
/// One probe per attempt; the inter-attempt delay only runs when another
/// attempt follows. Giving up while the resource is still transient
/// (`Timeout`) is a different failure than the remote side rejecting it
/// (`RemoteFailed`). Cancelling the owning task aborts the wait at the next
/// probe or sleep.
pub async fn wait_until_active<F, Fut>(mut probe: F, policy: PollPolicy) -> Result<(), PollError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<RemoteState, GeneratorError>>,
{
    for attempt in 1..=policy.max_attempts {
        match probe().await? {
            RemoteState::Active => {
                tracing::debug!(attempt, "remote resource active");
                return Ok(());
            }
            RemoteState::Failed => return Err(PollError::RemoteFailed),
            RemoteState::Processing => {
                tracing::debug!(
                    attempt,
                    max_attempts = policy.max_attempts,
                    "remote resource still processing"
                );
                if attempt < policy.max_attempts {
                    sleep(policy.interval).await;
                }
            }
        }
    }

    Err(PollError::Timeout {
        attempts: policy.max_attempts,
    })
}

#[derive(Debug, thiserror::Error)]
pub enum PollError {
    /// The resource never left its transient state within the attempt bound.
    #[error("remote resource still processing after {attempts} attempts")]
    Timeout { attempts: u32 },

    /// The remote side reported a permanent processing failure.
    #[error("remote resource processing failed")]
    RemoteFailed,

    #[error("status query failed: {0}")]
    Query(#[from] GeneratorError),
}
