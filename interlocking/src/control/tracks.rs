use log::info;
use std::collections::HashSet;

use crate::control::{overlap, points, signals, World};
use crate::error::{InterlockingError, Result};
use crate::state::{SegmentState, Train};
use crate::topology::{RouteId, SegmentId, SignalDirection, SignalId, Topology, TrackId};

/// The segments a route locks, in traversal order: from the start signal to
/// the first track's far end, every segment of intervening tracks, and from
/// the last track's near end to the end signal. A single-track route locks
/// the segments between the two signals.
pub fn segments_of_route(topology: &Topology, route: RouteId) -> Vec<SegmentId> {
    let r = &topology.routes[route];
    let start = &topology.signals[r.start_signal];
    let end = &topology.signals[r.end_signal];

    if start.track == end.track {
        let pos_start = topology.signal_index(r.start_signal);
        let pos_end = topology.signal_index(r.end_signal);
        return match start.direction {
            SignalDirection::WithTrack => (pos_start + 1..=pos_end)
                .map(|i| SegmentId::new(start.track, i))
                .collect(),
            SignalDirection::AgainstTrack => (pos_end + 1..=pos_start)
                .rev()
                .map(|i| SegmentId::new(start.track, i))
                .collect(),
        };
    }

    let mut result = segments_from_signal(topology, r.start_signal);
    for &track in &r.tracks[1..r.tracks.len() - 1] {
        result.extend((0..topology.tracks[track].segment_count()).map(|i| SegmentId::new(track, i)));
    }
    result.extend(segments_to_signal(topology, r.end_signal));
    result
}

/// Segments beyond a signal on its own track, in the signal's direction of
/// travel.
pub fn segments_from_signal(topology: &Topology, signal: SignalId) -> Vec<SegmentId> {
    let s = &topology.signals[signal];
    let pos = topology.signal_index(signal);
    let last = topology.tracks[s.track].signals.len();
    match s.direction {
        SignalDirection::WithTrack => (pos + 1..=last).map(|i| SegmentId::new(s.track, i)).collect(),
        SignalDirection::AgainstTrack => (0..=pos).rev().map(|i| SegmentId::new(s.track, i)).collect(),
    }
}

/// Segments a train passes on the signal's track before reaching it, in
/// traversal order.
pub fn segments_to_signal(topology: &Topology, signal: SignalId) -> Vec<SegmentId> {
    let s = &topology.signals[signal];
    let pos = topology.signal_index(signal);
    let last = topology.tracks[s.track].signals.len();
    match s.direction {
        SignalDirection::WithTrack => (0..=pos).map(|i| SegmentId::new(s.track, i)).collect(),
        SignalDirection::AgainstTrack => (pos + 1..=last).rev().map(|i| SegmentId::new(s.track, i)).collect(),
    }
}

/// A route's segments can be locked iff all of them are free. Overlap
/// segments are deliberately not part of this check: a route may be set even
/// while its overlap is already held as overlap by another route.
pub fn can_lock(world: &World, route: RouteId) -> bool {
    segments_of_route(&world.topology, route)
        .iter()
        .all(|&s| world.state.segment(s) == SegmentState::Free)
}

/// Reserves the route's segments and then the braking overlap behind its end
/// signal.
pub fn lock(world: &mut World, route: RouteId, train: &Train) -> Result<()> {
    for segment in segments_of_route(&world.topology, route) {
        info!(
            "set segment {} reserved",
            world.topology.segment_name(segment)
        );
        world.state.set_segment(segment, SegmentState::Reserved);
        world.state.segment_owner.insert(segment, route);
    }
    overlap::reserve(world, route, train)
}

/// Route release only returns the overlap; main-path segments are freed one
/// by one as the train vacates them.
pub fn release(world: &mut World, route: RouteId) -> Result<()> {
    overlap::release(world, route)
}

/// Marks a segment occupied and force-halts the signal protecting it:
/// the signal behind it if it reads with the track, the signal ahead if it
/// reads against it. Idempotent.
pub fn occupy(world: &mut World, segment: SegmentId) {
    if world.state.segment(segment) == SegmentState::Occupied {
        return;
    }
    info!(
        "set segment {} occupied",
        world.topology.segment_name(segment)
    );
    world.state.set_segment(segment, SegmentState::Occupied);

    let (behind, ahead) = {
        let track = &world.topology.tracks[segment.track];
        let behind = if segment.index > 0 {
            Some(track.signals[segment.index - 1])
        } else {
            None
        };
        let ahead = if segment.index < track.signals.len() {
            Some(track.signals[segment.index])
        } else {
            None
        };
        (behind, ahead)
    };
    if let Some(sig) = behind {
        if world.topology.signals[sig].direction == SignalDirection::WithTrack {
            signals::set_halt(world, sig);
        }
    }
    if let Some(sig) = ahead {
        if world.topology.signals[sig].direction == SignalDirection::AgainstTrack {
            signals::set_halt(world, sig);
        }
    }
}

/// Marks a segment free again. When the vacated segment is at a track
/// extremity and that extremity is the trailing end relative to the owning
/// route's traversal direction, the boundary point is freed as well.
pub fn free(world: &mut World, segment: SegmentId) -> Result<()> {
    if world.state.segment(segment) == SegmentState::Free {
        return Ok(());
    }
    info!("set segment {} free", world.topology.segment_name(segment));
    world.state.set_segment(segment, SegmentState::Free);
    world.state.segment_owner.remove(&segment);

    let last = world.topology.tracks[segment.track].signals.len();
    if segment.index != 0 && segment.index != last {
        return Ok(());
    }

    let route = owning_route(world, segment)?;
    let direction = driving_direction(&world.topology, route, segment.track)?;
    let (left_point, right_point) = {
        let track = &world.topology.tracks[segment.track];
        (track.left_point, track.right_point)
    };
    if segment.index == 0 && direction == SignalDirection::WithTrack {
        points::free(world, left_point);
    } else if segment.index == last && direction == SignalDirection::AgainstTrack {
        points::free(world, right_point);
    }
    Ok(())
}

/// Resolves which active route owns a segment. Locked path segments resolve
/// through the owner table; segments ahead of a route's start signal (where
/// the train is first detected) fall back to track membership.
fn owning_route(world: &World, segment: SegmentId) -> Result<RouteId> {
    if let Some(&route) = world.state.segment_owner.get(&segment) {
        return Ok(route);
    }
    world
        .state
        .active
        .iter()
        .find(|a| world.topology.routes[a.route].tracks.contains(&segment.track))
        .map(|a| a.route)
        .ok_or(InterlockingError::ActiveRouteNotFound { segment })
}

/// The direction a route's train traverses the given track in, derived from
/// which end of the track meets the preceding track's boundary points.
pub fn driving_direction(
    topology: &Topology,
    route: RouteId,
    track: TrackId,
) -> Result<SignalDirection> {
    let r = &topology.routes[route];
    if r.tracks.first() == Some(&track) {
        return Ok(topology.signals[r.start_signal].direction);
    }
    for i in 1..r.tracks.len() {
        if r.tracks[i] != track {
            continue;
        }
        let prev = &topology.tracks[r.tracks[i - 1]];
        let cur = &topology.tracks[track];
        if cur.left_point == prev.left_point || cur.left_point == prev.right_point {
            return Ok(SignalDirection::WithTrack);
        }
        if cur.right_point == prev.left_point || cur.right_point == prev.right_point {
            return Ok(SignalDirection::AgainstTrack);
        }
        return Err(InterlockingError::UnconnectedTracks {
            route,
            a: r.tracks[i - 1],
            b: track,
        });
    }
    Err(InterlockingError::UnconnectedTracks {
        route,
        a: track,
        b: track,
    })
}

/// Two routes collide if their locked paths intersect, or if either of them
/// has no overlap candidate at all that stays clear of the other's locked
/// path. Overlap choice is adaptive, so one conflict-free candidate on either
/// side is enough to let both routes coexist.
pub fn collide(topology: &Topology, route_a: RouteId, route_b: RouteId) -> bool {
    let segments_a: HashSet<SegmentId> = segments_of_route(topology, route_a).into_iter().collect();
    let segments_b: HashSet<SegmentId> = segments_of_route(topology, route_b).into_iter().collect();
    if segments_a.iter().any(|s| segments_b.contains(s)) {
        return true;
    }
    no_clear_overlap(topology, route_a, &segments_b) || no_clear_overlap(topology, route_b, &segments_a)
}

fn no_clear_overlap(topology: &Topology, route: RouteId, other: &HashSet<SegmentId>) -> bool {
    match overlap::candidates(topology, route, overlap::DEFAULT_MAX_SPEED) {
        Ok(candidates) => candidates
            .iter()
            .all(|c| c.segments.iter().any(|s| other.contains(s))),
        // No overlap exists at all behind this route; it cannot stay clear.
        Err(_) => true,
    }
}
