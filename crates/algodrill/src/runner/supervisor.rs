//! Deadline race between a worker's answer and the clock

use std::time::Duration;

use tokio::sync::oneshot;
use tracing::{debug, instrument, warn};

use crate::sandbox::{KillSwitch, WorkerError};

/// Which event ended the race
#[derive(Debug, PartialEq, Eq)]
pub enum Supervised<T> {
    /// The worker answered in time
    Finished(T),
    /// The deadline passed first; the worker has been told to stop
    TimedOut,
    /// The worker died or went away without answering
    Faulted(WorkerError),
}

/// Wait for the worker's answer, up to `deadline`
///
/// On expiry the kill switch is tripped and the receiver dropped, so a late
/// answer is discarded on the worker side. Exactly one event is reported.
#[instrument(skip(rx, kill))]
pub async fn supervise<T>(
    rx: oneshot::Receiver<Result<T, WorkerError>>,
    kill: &KillSwitch,
    deadline: Duration,
) -> Supervised<T> {
    match tokio::time::timeout(deadline, rx).await {
        Ok(Ok(Ok(value))) => Supervised::Finished(value),
        Ok(Ok(Err(e))) => {
            warn!(error = %e, "worker faulted");
            Supervised::Faulted(e)
        }
        Ok(Err(_)) => {
            warn!("worker dropped its channel");
            Supervised::Faulted(WorkerError::Disconnected)
        }
        Err(_) => {
            debug!("deadline passed, tripping kill switch");
            kill.trip();
            Supervised::TimedOut
        }
    }
}
