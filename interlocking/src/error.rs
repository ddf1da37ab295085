use failure_derive::Fail;

use crate::topology::{PointId, RouteId, SegmentId, TrackId};

/// Failure modes of the interlocking core.
///
/// `RouteBlocked` is deliberately not in here: a blocked route is a normal,
/// retryable outcome reported through the operation result, not an error.
/// Everything below either indicates inconsistent input topology or an
/// internal consistency violation; it aborts the current operation (never the
/// engine loop) and is surfaced to the submitter.
#[derive(Debug, Fail, PartialEq)]
pub enum InterlockingError {
    #[fail(
        display = "point {} cannot connect tracks {} and {} through its head",
        point, track_in, track_out
    )]
    AmbiguousOrientation {
        point: PointId,
        track_in: TrackId,
        track_out: TrackId,
    },

    #[fail(
        display = "overlap point {} does not resolve to a left/right orientation",
        point
    )]
    OverlapOrientationConflict { point: PointId },

    #[fail(display = "overlap search ran off the track network behind route {}", route)]
    TopologyExhausted { route: RouteId },

    #[fail(display = "no reservable overlap candidate for route {}", route)]
    OverlapUnavailable { route: RouteId },

    #[fail(display = "no active route claims segment {:?}", segment)]
    ActiveRouteNotFound { segment: SegmentId },

    #[fail(display = "route {} is not active", route)]
    RouteNotActive { route: RouteId },

    #[fail(display = "overlap of route {} was already released", route)]
    OverlapAlreadyReleased { route: RouteId },

    #[fail(
        display = "train counted out of segment {:?} that no train was counted into",
        segment
    )]
    UnknownSegmentOccupancy { segment: SegmentId },

    #[fail(
        display = "tracks {} and {} on route {} are not connected by any point",
        a, b, route
    )]
    UnconnectedTracks { route: RouteId, a: TrackId, b: TrackId },
}

pub type Result<T> = std::result::Result<T, InterlockingError>;
