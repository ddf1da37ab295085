use log::info;
use smallvec::SmallVec;

use crate::control::World;
use crate::error::{InterlockingError, Result};
use crate::state::LockState;
use crate::topology::{PointId, RouteId, SwitchSide, Topology, TrackId};

/// The points a route runs over, one entry per consecutive track pair,
/// together with the pair it connects.
pub fn points_of_route(
    topology: &Topology,
    route: RouteId,
) -> SmallVec<[(PointId, TrackId, TrackId); 2]> {
    let mut result = SmallVec::new();
    for pair in topology.routes[route].tracks.windows(2) {
        let (track_in, track_out) = (pair[0], pair[1]);
        for (id, point) in topology.points.iter().enumerate() {
            if point.connects(track_in, track_out) {
                result.push((id, track_in, track_out));
            }
        }
    }
    result
}

/// A route's points can be locked iff all of them are free.
pub fn can_lock(world: &World, route: RouteId) -> bool {
    points_of_route(&world.topology, route)
        .iter()
        .all(|&(p, _, _)| world.state.points[p].lock == LockState::Free)
}

/// Moves and reserves every point of the route.
pub fn lock(world: &mut World, route: RouteId) -> Result<()> {
    for (point, track_in, track_out) in points_of_route(&world.topology, route) {
        let side = world.topology.points[point]
            .required_orientation(track_in, track_out)
            .ok_or(InterlockingError::AmbiguousOrientation {
                point,
                track_in,
                track_out,
            })?;
        turn(world, point, side);
        reserve(world, point, LockState::Reserved);
    }
    Ok(())
}

/// Physically moves the point if its orientation differs from the required
/// one; a matching orientation needs no movement.
pub fn turn(world: &mut World, point: PointId, side: SwitchSide) {
    if world.state.points[point].orientation == Some(side) {
        return;
    }
    info!("move point {} to {}", world.topology.points[point].name, side);
    world.state.points[point].orientation = Some(side);
    for provider in world.providers.iter_mut() {
        provider.set_point_orientation(point, side);
    }
}

pub fn reserve(world: &mut World, point: PointId, lock: LockState) {
    info!(
        "set point {} to {}",
        world.topology.points[point].name, lock
    );
    world.state.points[point].lock = lock;
}

pub fn free(world: &mut World, point: PointId) {
    info!("set point {} to free", world.topology.points[point].name);
    world.state.points[point].lock = LockState::Free;
}

/// Two routes collide on points iff their point sets intersect.
pub fn collide(topology: &Topology, route_a: RouteId, route_b: RouteId) -> bool {
    let points_b = points_of_route(topology, route_b);
    points_of_route(topology, route_a)
        .iter()
        .any(|&(p, _, _)| points_b.iter().any(|&(q, _, _)| p == q))
}

pub fn reset(world: &mut World) {
    for point in world.state.points.iter_mut() {
        point.orientation = None;
        point.lock = LockState::Free;
    }
}
