use log::info;
use std::sync::Arc;

use crate::control::{detection, points, signals, tracks, World};
use crate::error::{InterlockingError, Result};
use crate::provider::InfrastructureProvider;
use crate::state::{ActiveRoute, InterlockingState, SegmentState, Train};
use crate::topology::{RouteId, SegmentId, Topology};

/// The interlocking facade: grants trains exclusive, conflict-free use of
/// track resources for the duration of a route and releases them as trains
/// pass. All methods mutate through the lock managers; the engine's consumer
/// task is the only caller, which is what makes the exactly-one-mutator
/// invariant hold without further locking.
pub struct Interlocking {
    world: World,
}

impl Interlocking {
    pub fn new(topology: Arc<Topology>, providers: Vec<Box<dyn InfrastructureProvider>>) -> Self {
        Interlocking {
            world: World::new(topology, providers),
        }
    }

    pub fn topology(&self) -> &Topology {
        &self.world.topology
    }

    pub fn state(&self) -> &InterlockingState {
        &self.world.state
    }

    /// Read-only availability check; the simulation collaborator polls this
    /// before submitting a `SetRoute`.
    pub fn can_route_be_set(&self, route: RouteId) -> bool {
        tracks::can_lock(&self.world, route) && points::can_lock(&self.world, route)
    }

    /// Locks the route for the given train. Returns `Ok(false)` when some
    /// resource is unavailable (a normal, retryable outcome); on success the
    /// route is active and its start signal shows go.
    pub fn set_route(&mut self, route: RouteId, train: &Train) -> Result<bool> {
        if !self.can_route_be_set(route) {
            info!(
                "route {} is blocked, train {} has to wait",
                self.world.topology.routes[route].name, train.name
            );
            return Ok(false);
        }
        info!(
            "set route {} for train {}",
            self.world.topology.routes[route].name, train.name
        );
        self.world.state.active.push(ActiveRoute {
            route,
            train: train.name.clone(),
            overlap: None,
        });
        points::lock(&mut self.world, route)?;
        tracks::lock(&mut self.world, route, train)?;
        let start_signal = self.world.topology.routes[route].start_signal;
        signals::set_go(&mut self.world, start_signal);
        Ok(true)
    }

    /// Releases a route's overlap and removes it from the active route
    /// table. Its main-path segments are freed individually by train
    /// detection, not here.
    pub fn free_route(&mut self, route: RouteId) -> Result<()> {
        if self.world.state.active_entry(route).is_none() {
            return Err(InterlockingError::RouteNotActive { route });
        }
        info!("free route {}", self.world.topology.routes[route].name);
        tracks::release(&mut self.world, route)?;
        let state = &mut self.world.state;
        state.segment_owner.retain(|_, &mut r| r != route);
        state.active.retain(|a| a.route != route);
        Ok(())
    }

    /// Pairwise conflict analysis over locked paths, points and adaptive
    /// overlap choice.
    pub fn do_two_routes_collide(&self, route_a: RouteId, route_b: RouteId) -> bool {
        tracks::collide(&self.world.topology, route_a, route_b)
            || points::collide(&self.world.topology, route_a, route_b)
    }

    pub fn count_in(&mut self, segment: SegmentId, train: &str) {
        info!(
            "train {} detected entering segment {}",
            train,
            self.world.topology.segment_name(segment)
        );
        detection::count_in(&mut self.world, segment);
    }

    pub fn count_out(&mut self, segment: SegmentId, train: &str) -> Result<()> {
        info!(
            "train {} detected leaving segment {}",
            train,
            self.world.topology.segment_name(segment)
        );
        detection::count_out(&mut self.world, segment)
    }

    /// Returns every resource to its initial state: points undefined/free,
    /// segments free, signals halt, active route table and detection
    /// counters empty.
    pub fn reset(&mut self) {
        info!("reset interlocking state");
        points::reset(&mut self.world);
        for track in self.world.state.segments.iter_mut() {
            for segment in track.iter_mut() {
                *segment = SegmentState::Free;
            }
        }
        signals::reset(&mut self.world);
        let state = &mut self.world.state;
        state.active.clear();
        state.segment_owner.clear();
        state.overlap_segment_refs.clear();
        state.overlap_point_refs.clear();
        state.occupancy.clear();
    }

    /// Textual snapshot of every point/segment/signal state and the active
    /// route list. Diagnostics only; not a stability-guaranteed format.
    pub fn dump_state(&self) -> String {
        let topology = &self.world.topology;
        let state = &self.world.state;
        let mut out = String::new();

        out.push_str("State of points:\n");
        for (id, point) in topology.points.iter().enumerate() {
            let ps = &state.points[id];
            let orientation = match ps.orientation {
                Some(side) => side.to_string(),
                None => "undefined".to_string(),
            };
            out.push_str(&format!(
                "  {}: {} (orientation: {})\n",
                point.name, ps.lock, orientation
            ));
        }

        out.push_str("State of segments:\n");
        for (track_id, track) in topology.tracks.iter().enumerate() {
            for index in 0..track.segment_count() {
                let segment = SegmentId::new(track_id, index);
                out.push_str(&format!(
                    "  {}: {}\n",
                    topology.segment_name(segment),
                    state.segment(segment)
                ));
            }
        }

        out.push_str("State of signals:\n");
        for (id, signal) in topology.signals.iter().enumerate() {
            out.push_str(&format!("  {}: {}\n", signal.name, state.signals[id]));
        }

        out.push_str("Active routes:\n");
        for active in &state.active {
            out.push_str(&format!(
                "  {} (train {})\n",
                topology.routes[active.route].name, active.train
            ));
        }
        out
    }
}

// Re-exported here so collaborators can size overlaps without reaching into
// the manager modules.
pub use crate::control::overlap::required_length;
