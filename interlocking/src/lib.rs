//! Railway interlocking core: grants trains exclusive, conflict-free use of
//! track resources (segments, points, signals) for the duration of a route
//! and releases them as trains pass. Consumes a finalized topology and a
//! stream of discrete operations; parsing, route generation and train motion
//! are external collaborators.

pub mod control;
pub mod engine;
pub mod error;
pub mod interlocking;
pub mod provider;
pub mod state;
pub mod topology;

#[cfg(test)]
mod tests;

pub use crate::engine::{spawn, Operation, OperationQueue, Outcome};
pub use crate::error::InterlockingError;
pub use crate::interlocking::Interlocking;
pub use crate::provider::{InfrastructureProvider, LoggingInfrastructureProvider};
pub use crate::state::{Overlap, SegmentState, SignalAspect, Train};
pub use crate::topology::{SegmentId, Topology};

pub type AppResult<T> = Result<T, failure::Error>;
