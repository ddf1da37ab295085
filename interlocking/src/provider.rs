use log::info;
use std::sync::Arc;

use crate::state::SignalAspect;
use crate::topology::{PointId, SignalDirection, SignalId, SwitchSide, Topology};

/// Capability consumed by the interlocking for driving physical (or
/// simulated) infrastructure. Every registered provider is called on every
/// state-changing action, so one provider can drive the field elements while
/// another only records.
pub trait InfrastructureProvider: Send {
    fn set_point_orientation(&mut self, point: PointId, side: SwitchSide);

    /// The direction is passed along because aspect commands differ per
    /// reading direction on bidirectional tracks.
    fn set_signal_aspect(&mut self, signal: SignalId, aspect: SignalAspect, direction: SignalDirection);
}

/// Provider that only writes the commands to the log.
pub struct LoggingInfrastructureProvider {
    topology: Arc<Topology>,
}

impl LoggingInfrastructureProvider {
    pub fn new(topology: Arc<Topology>) -> Self {
        LoggingInfrastructureProvider { topology }
    }
}

impl InfrastructureProvider for LoggingInfrastructureProvider {
    fn set_point_orientation(&mut self, point: PointId, side: SwitchSide) {
        info!("point {} turned {}", self.topology.points[point].name, side);
    }

    fn set_signal_aspect(&mut self, signal: SignalId, aspect: SignalAspect, direction: SignalDirection) {
        info!(
            "signal {} shows {} ({:?})",
            self.topology.signals[signal].name, aspect, direction
        );
    }
}
