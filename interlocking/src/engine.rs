use log::{error, info};
use std::sync::mpsc;
use std::thread;

use crate::error::InterlockingError;
use crate::interlocking::Interlocking;
use crate::state::Train;
use crate::topology::{RouteId, SegmentId};
use crate::AppResult;

/// The discrete operations the simulation collaborator can submit.
#[derive(Debug)]
pub enum Operation {
    SetRoute { route: RouteId, train: Train },
    FreeRoute { route: RouteId },
    DetectIn { segment: SegmentId, train: String },
    DetectOut { segment: SegmentId, train: String },
    Reset,
    PrintState,
    Shutdown,
}

/// Result of one fully applied operation.
#[derive(Debug, PartialEq)]
pub enum Outcome {
    Completed,
    /// The route's resources are unavailable; retry on a later step.
    RouteBlocked,
    /// State snapshot, for `PrintState`.
    State(String),
}

struct Submission {
    operation: Operation,
    done: mpsc::Sender<Result<Outcome, InterlockingError>>,
}

/// Producer-side handle to the engine. `submit` enqueues an operation and
/// blocks until the engine has fully applied it (and everything queued ahead
/// of it), so a caller can set a route and immediately read the resulting
/// lock state without extra synchronization.
#[derive(Clone)]
pub struct OperationQueue {
    tx: mpsc::Sender<Submission>,
}

impl OperationQueue {
    pub fn submit(&self, operation: Operation) -> AppResult<Outcome> {
        let (done_tx, done_rx) = mpsc::channel();
        self.tx
            .send(Submission {
                operation,
                done: done_tx,
            })
            .map_err(|_| failure::err_msg("interlocking engine is not running"))?;
        let result = done_rx
            .recv()
            .map_err(|_| failure::err_msg("interlocking engine stopped before completion"))?;
        Ok(result?)
    }
}

/// Starts the single-consumer engine on its own thread. All submitted
/// operations are applied strictly in arrival order, one at a time. The join
/// handle yields the final `Interlocking` after `Shutdown`, so its state can
/// still be inspected.
pub fn spawn(interlocking: Interlocking) -> (OperationQueue, thread::JoinHandle<Interlocking>) {
    let (tx, rx) = mpsc::channel();
    let handle = thread::spawn(move || run(interlocking, rx));
    (OperationQueue { tx }, handle)
}

fn run(mut interlocking: Interlocking, rx: mpsc::Receiver<Submission>) -> Interlocking {
    info!("interlocking engine started");
    while let Ok(Submission { operation, done }) = rx.recv() {
        let shutdown = matches!(operation, Operation::Shutdown);
        let result = apply(&mut interlocking, operation);
        if let Err(ref e) = result {
            // A failed operation aborts, but the engine keeps consuming.
            error!("operation failed: {}", e);
        }
        // A disconnected submitter cannot be notified; the operation has
        // still been applied.
        let _ = done.send(result);
        if shutdown {
            break;
        }
    }
    info!("interlocking engine stopped");
    interlocking
}

fn apply(
    interlocking: &mut Interlocking,
    operation: Operation,
) -> Result<Outcome, InterlockingError> {
    match operation {
        Operation::SetRoute { route, train } => {
            if interlocking.set_route(route, &train)? {
                Ok(Outcome::Completed)
            } else {
                Ok(Outcome::RouteBlocked)
            }
        }
        Operation::FreeRoute { route } => {
            interlocking.free_route(route)?;
            Ok(Outcome::Completed)
        }
        Operation::DetectIn { segment, train } => {
            interlocking.count_in(segment, &train);
            Ok(Outcome::Completed)
        }
        Operation::DetectOut { segment, train } => {
            interlocking.count_out(segment, &train)?;
            Ok(Outcome::Completed)
        }
        Operation::Reset => {
            interlocking.reset();
            Ok(Outcome::Completed)
        }
        Operation::PrintState => Ok(Outcome::State(interlocking.dump_state())),
        Operation::Shutdown => Ok(Outcome::Completed),
    }
}
