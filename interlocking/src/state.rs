use smallvec::SmallVec;
use std::collections::HashMap;
use std::fmt;

use crate::topology::{PointId, RouteId, SegmentId, SwitchSide, Topology, TrackId};

/// Lock state of a point.
#[derive(Copy, Clone, PartialEq, Eq, Debug)]
pub enum LockState {
    Free,
    Reserved,
    ReservedOverlap,
}

impl fmt::Display for LockState {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            LockState::Free => write!(f, "free"),
            LockState::Reserved => write!(f, "reserved"),
            LockState::ReservedOverlap => write!(f, "reserved-overlap"),
        }
    }
}

/// Lock state of a track segment.
#[derive(Copy, Clone, PartialEq, Eq, Debug)]
pub enum SegmentState {
    Free,
    Reserved,
    ReservedOverlap,
    Occupied,
}

impl fmt::Display for SegmentState {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            SegmentState::Free => write!(f, "free"),
            SegmentState::Reserved => write!(f, "reserved"),
            SegmentState::ReservedOverlap => write!(f, "reserved-overlap"),
            SegmentState::Occupied => write!(f, "occupied"),
        }
    }
}

#[derive(Copy, Clone, PartialEq, Eq, Debug)]
pub enum SignalAspect {
    Halt,
    Go,
}

impl fmt::Display for SignalAspect {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            SignalAspect::Halt => write!(f, "halt"),
            SignalAspect::Go => write!(f, "go"),
        }
    }
}

#[derive(Copy, Clone, Debug)]
pub struct PointState {
    /// `None` until a route-setting or overlap-reservation operation has
    /// explicitly moved the point.
    pub orientation: Option<SwitchSide>,
    pub lock: LockState,
}

/// A train as seen by the interlocking: an opaque name and the speed class
/// that sizes its braking overlap. No kinematics.
#[derive(Clone, Debug)]
pub struct Train {
    pub name: String,
    /// km/h
    pub max_speed: u32,
}

impl Train {
    pub fn new(name: &str, max_speed: u32) -> Self {
        Train {
            name: name.to_string(),
            max_speed,
        }
    }
}

/// The extra length of track locked beyond a route's end signal to cover the
/// train's braking distance.
#[derive(Clone, Debug, PartialEq)]
pub struct Overlap {
    /// In order of collection along the search path.
    pub segments: SmallVec<[SegmentId; 4]>,
    /// Points traversed while extending past the end signal.
    pub points: SmallVec<[PointId; 2]>,
    pub required_length: f64,
    pub missing_length: f64,
}

impl Overlap {
    pub fn new(required_length: f64) -> Self {
        Overlap {
            segments: SmallVec::new(),
            points: SmallVec::new(),
            required_length,
            missing_length: required_length,
        }
    }

    pub fn is_satisfied(&self) -> bool {
        self.missing_length <= 0.0
    }

    pub fn add_segment(&mut self, segment: SegmentId, length: f64) {
        self.segments.push(segment);
        self.missing_length -= length;
    }

    pub fn visits_track(&self, track: TrackId) -> bool {
        self.segments.iter().any(|s| s.track == track)
    }
}

/// One entry of the active route table: a route currently held by a train.
/// The entry owns the route's reserved overlap; it is released exactly once
/// per activation.
#[derive(Debug)]
pub struct ActiveRoute {
    pub route: RouteId,
    pub train: String,
    pub overlap: Option<Overlap>,
}

/// All mutable interlocking state, owned exclusively by the engine's consumer
/// task. The topology it indexes into never changes shape.
#[derive(Debug)]
pub struct InterlockingState {
    pub points: Vec<PointState>,
    /// Per track, per segment index.
    pub segments: Vec<Vec<SegmentState>>,
    pub signals: Vec<SignalAspect>,
    pub active: Vec<ActiveRoute>,
    /// Locked main-path segment -> owning active route.
    pub segment_owner: HashMap<SegmentId, RouteId>,
    /// How many active routes' overlaps reference a segment/point. Overlaps
    /// are shareable; a resource is freed when its count reaches zero.
    pub overlap_segment_refs: HashMap<SegmentId, usize>,
    pub overlap_point_refs: HashMap<PointId, usize>,
    /// Train detection counters (several trains may be detected on the same
    /// segment at once).
    pub occupancy: HashMap<SegmentId, u32>,
}

impl InterlockingState {
    pub fn new(topology: &Topology) -> Self {
        InterlockingState {
            points: topology
                .points
                .iter()
                .map(|_| PointState {
                    orientation: None,
                    lock: LockState::Free,
                })
                .collect(),
            segments: topology
                .tracks
                .iter()
                .map(|t| vec![SegmentState::Free; t.segment_count()])
                .collect(),
            signals: topology.signals.iter().map(|_| SignalAspect::Halt).collect(),
            active: Vec::new(),
            segment_owner: HashMap::new(),
            overlap_segment_refs: HashMap::new(),
            overlap_point_refs: HashMap::new(),
            occupancy: HashMap::new(),
        }
    }

    pub fn segment(&self, segment: SegmentId) -> SegmentState {
        self.segments[segment.track][segment.index]
    }

    pub fn set_segment(&mut self, segment: SegmentId, state: SegmentState) {
        self.segments[segment.track][segment.index] = state;
    }

    pub fn active_entry(&self, route: RouteId) -> Option<&ActiveRoute> {
        self.active.iter().find(|a| a.route == route)
    }

    pub fn active_entry_mut(&mut self, route: RouteId) -> Option<&mut ActiveRoute> {
        self.active.iter_mut().find(|a| a.route == route)
    }
}
