pub mod detection;
pub mod overlap;
pub mod points;
pub mod signals;
pub mod tracks;

use std::sync::Arc;

use crate::provider::InfrastructureProvider;
use crate::state::InterlockingState;
use crate::topology::Topology;

/// Everything the lock managers operate on: the immutable topology, the
/// mutable lock state and the registered infrastructure providers. Owned by
/// the engine's single consumer task, so no further synchronization is
/// needed.
pub struct World {
    pub topology: Arc<Topology>,
    pub state: InterlockingState,
    pub providers: Vec<Box<dyn InfrastructureProvider>>,
}

impl World {
    pub fn new(topology: Arc<Topology>, providers: Vec<Box<dyn InfrastructureProvider>>) -> Self {
        let state = InterlockingState::new(&topology);
        World {
            topology,
            state,
            providers,
        }
    }
}
