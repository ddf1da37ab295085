use log::{info, warn};
use ordered_float::OrderedFloat;
use smallvec::SmallVec;

use crate::control::{points, tracks, World};
use crate::error::{InterlockingError, Result};
use crate::state::{LockState, Overlap, SegmentState, Train};
use crate::topology::{PointId, RouteId, SegmentId, SignalDirection, SwitchSide, Topology, TrackId};

/// Speed class used when no concrete train is known, e.g. for static route
/// conflict analysis.
pub const DEFAULT_MAX_SPEED: u32 = 70;

/// Overlap length policy (German practice, tunable).
pub fn required_length(max_speed: u32) -> f64 {
    if max_speed <= 30 {
        0.0
    } else if max_speed <= 40 {
        50.0
    } else if max_speed <= 60 {
        100.0
    } else {
        200.0
    }
}

/// Computes the candidate overlaps behind a route's end signal: successive
/// segments in the signal's direction of travel, branching depth-first at
/// every point reached at a track's far end. Returns all satisfied
/// candidates, or the single longest one (with a degraded-safety warning)
/// when the topology cannot provide the required length, or
/// `TopologyExhausted` when there is no candidate at all.
pub fn candidates(topology: &Topology, route: RouteId, max_speed: u32) -> Result<Vec<Overlap>> {
    let required = required_length(max_speed);
    let mut overlap = Overlap::new(required);
    if required <= 0.0 {
        return Ok(vec![overlap]);
    }

    let end_signal = topology.routes[route].end_signal;
    for segment in tracks::segments_from_signal(topology, end_signal) {
        overlap.add_segment(segment, topology.segment_length(segment));
        if overlap.is_satisfied() {
            return Ok(vec![overlap]);
        }
    }

    // The end signal's track alone is not long enough; branch across points.
    let end_track = topology.signals[end_signal].track;
    let direction = topology.signals[end_signal].direction;
    let mut found = Vec::new();
    extend_candidates(
        topology,
        end_track,
        direction,
        overlap,
        SmallVec::from_slice(&[end_track]),
        &mut found,
    );

    if found.is_empty() {
        return Err(InterlockingError::TopologyExhausted { route });
    }
    let satisfied: Vec<Overlap> = found.iter().filter(|o| o.is_satisfied()).cloned().collect();
    if !satisfied.is_empty() {
        return Ok(satisfied);
    }
    warn!(
        "no overlap behind route {} reaches {}m, falling back to the longest one",
        topology.routes[route].name, required
    );
    let longest = found
        .into_iter()
        .min_by_key(|o| OrderedFloat(o.missing_length))
        .expect("candidate list checked non-empty");
    Ok(vec![longest])
}

/// Depth-first branch step: cross the point at the current track's far end
/// and continue onto each connected successor, appending that track's
/// segments in traversal order. Each branch keeps its own visited-track set,
/// so the search terminates even on cyclic track plans.
fn extend_candidates(
    topology: &Topology,
    cur_track: TrackId,
    direction: SignalDirection,
    mut overlap: Overlap,
    mut visited: SmallVec<[TrackId; 4]>,
    out: &mut Vec<Overlap>,
) {
    let next_point = match direction {
        SignalDirection::WithTrack => topology.tracks[cur_track].right_point,
        SignalDirection::AgainstTrack => topology.tracks[cur_track].left_point,
    };
    overlap.points.push(next_point);
    visited.push(cur_track);

    for successor in topology.points[next_point].successors(cur_track) {
        if visited.contains(&successor) {
            continue;
        }
        // Which end of the successor meets the branching point decides the
        // traversal direction, and with it the segment order.
        let succ_direction = if topology.tracks[successor].right_point == next_point {
            SignalDirection::AgainstTrack
        } else {
            SignalDirection::WithTrack
        };
        let mut branch = overlap.clone();
        let count = topology.tracks[successor].segment_count();
        let indices: Vec<usize> = match succ_direction {
            SignalDirection::WithTrack => (0..count).collect(),
            SignalDirection::AgainstTrack => (0..count).rev().collect(),
        };
        for index in indices {
            let segment = SegmentId::new(successor, index);
            branch.add_segment(segment, topology.segment_length(segment));
            if branch.is_satisfied() {
                break;
            }
        }
        out.push(branch.clone());
        if !branch.is_satisfied() {
            extend_candidates(topology, successor, succ_direction, branch, visited.clone(), out);
        }
    }
}

/// Reserves the first reservable candidate for the route and stores it on the
/// route's active-route entry. A candidate is reservable iff every segment
/// and point in it is free or already held as overlap by another route
/// (overlaps are shareable safety margins, not occupied paths).
pub fn reserve(world: &mut World, route: RouteId, train: &Train) -> Result<()> {
    let candidates = candidates(&world.topology, route, train.max_speed)?;
    let chosen = candidates
        .into_iter()
        .find(|c| reservable(world, c))
        .ok_or(InterlockingError::OverlapUnavailable { route })?;

    for &segment in &chosen.segments {
        info!(
            "set segment {} reserved (overlap)",
            world.topology.segment_name(segment)
        );
        world.state.set_segment(segment, SegmentState::ReservedOverlap);
        *world.state.overlap_segment_refs.entry(segment).or_insert(0) += 1;
    }

    for &point in &chosen.points {
        points::reserve(world, point, LockState::ReservedOverlap);
        *world.state.overlap_point_refs.entry(point).or_insert(0) += 1;
        let side = overlap_point_orientation(&world.topology, &chosen, point)?;
        points::turn(world, point, side);
    }

    world
        .state
        .active_entry_mut(route)
        .ok_or(InterlockingError::RouteNotActive { route })?
        .overlap = Some(chosen);
    Ok(())
}

/// An overlap point must be adjacent to exactly two of the overlap's tracks,
/// and those two must resolve to a left/right orientation.
fn overlap_point_orientation(
    topology: &Topology,
    overlap: &Overlap,
    point: PointId,
) -> Result<SwitchSide> {
    let p = &topology.points[point];
    let adjacent: SmallVec<[TrackId; 2]> = [p.head, p.left, p.right]
        .iter()
        .filter_map(|leg| *leg)
        .filter(|&t| overlap.visits_track(t))
        .collect();
    if adjacent.len() != 2 {
        return Err(InterlockingError::OverlapOrientationConflict { point });
    }
    p.required_orientation(adjacent[0], adjacent[1])
        .ok_or(InterlockingError::OverlapOrientationConflict { point })
}

/// Releases the overlap stored on the route's active entry. Each segment and
/// point is freed only once no other active route's overlap references it.
pub fn release(world: &mut World, route: RouteId) -> Result<()> {
    let overlap = world
        .state
        .active_entry_mut(route)
        .ok_or(InterlockingError::RouteNotActive { route })?
        .overlap
        .take()
        .ok_or(InterlockingError::OverlapAlreadyReleased { route })?;

    for &segment in &overlap.segments {
        let remaining = {
            let refs = world
                .state
                .overlap_segment_refs
                .entry(segment)
                .or_insert(1);
            *refs = refs.saturating_sub(1);
            *refs
        };
        if remaining == 0 {
            world.state.overlap_segment_refs.remove(&segment);
            info!("set segment {} free", world.topology.segment_name(segment));
            world.state.set_segment(segment, SegmentState::Free);
        }
    }

    for &point in &overlap.points {
        let remaining = {
            let refs = world.state.overlap_point_refs.entry(point).or_insert(1);
            *refs = refs.saturating_sub(1);
            *refs
        };
        if remaining == 0 {
            world.state.overlap_point_refs.remove(&point);
            points::free(world, point);
        }
    }
    Ok(())
}

fn reservable(world: &World, overlap: &Overlap) -> bool {
    let segments_ok = overlap.segments.iter().all(|&s| {
        let state = world.state.segment(s);
        state == SegmentState::Free || state == SegmentState::ReservedOverlap
    });
    let points_ok = overlap.points.iter().all(|&p| {
        let lock = world.state.points[p].lock;
        lock == LockState::Free || lock == LockState::ReservedOverlap
    });
    segments_ok && points_ok
}
