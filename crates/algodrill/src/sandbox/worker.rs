//! Dedicated OS thread for one run
//!
//! The job is moved into a fresh thread with its own stack and its result
//! comes back on a oneshot channel. Nothing else crosses the boundary. If
//! the receiver has already been dropped (the run timed out or was
//! superseded) the result is discarded on the worker side.

use std::any::Any;
use std::panic::{self, AssertUnwindSafe};
use std::thread;

use thiserror::Error;
use tokio::sync::oneshot;
use tracing::{debug, warn};

/// Errors that occur at the worker boundary
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum WorkerError {
    #[error("failed to spawn worker thread: {0}")]
    Spawn(String),

    #[error("worker panicked: {0}")]
    Panicked(String),

    #[error("worker exited without answering")]
    Disconnected,
}

/// Start `job` on its own thread; the receiver yields its result or the
/// panic that ended it
pub fn spawn<T, F>(
    name: &str,
    stack_size: usize,
    job: F,
) -> Result<oneshot::Receiver<Result<T, WorkerError>>, WorkerError>
where
    T: Send + 'static,
    F: FnOnce() -> T + Send + 'static,
{
    let (tx, rx) = oneshot::channel();
    thread::Builder::new()
        .name(name.to_string())
        .stack_size(stack_size)
        .spawn(move || {
            let result = panic::catch_unwind(AssertUnwindSafe(job))
                .map_err(|payload| WorkerError::Panicked(panic_message(payload.as_ref())));
            if let Err(WorkerError::Panicked(message)) = &result {
                warn!(%message, "worker panicked");
            }
            if tx.send(result).is_err() {
                debug!("worker result discarded: receiver gone");
            }
        })
        .map_err(|e| WorkerError::Spawn(e.to_string()))?;
    Ok(rx)
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}
