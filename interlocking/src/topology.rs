use smallvec::SmallVec;
use std::fmt;

pub type PointId = usize;
pub type TrackId = usize;
pub type SignalId = usize;
pub type RouteId = usize;

/// The smallest lockable subdivision of a track: segment `i` lies between
/// signal `i-1` and signal `i` of its track.
#[derive(Copy, Clone, PartialEq, Eq, Hash, Debug)]
pub struct SegmentId {
    pub track: TrackId,
    pub index: usize,
}

impl SegmentId {
    pub fn new(track: TrackId, index: usize) -> Self {
        SegmentId { track, index }
    }
}

#[derive(Copy, Clone, PartialEq, Eq, Debug)]
pub enum SwitchSide {
    Left,
    Right,
}

impl fmt::Display for SwitchSide {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            SwitchSide::Left => write!(f, "left"),
            SwitchSide::Right => write!(f, "right"),
        }
    }
}

/// Which of a track's two physical traversal directions a signal governs.
#[derive(Copy, Clone, PartialEq, Eq, Debug)]
pub enum SignalDirection {
    /// Reading trains travel from the track's left end towards its right end.
    WithTrack,
    /// Reading trains travel from the track's right end towards its left end.
    AgainstTrack,
}

#[derive(Copy, Clone, PartialEq, Eq, Debug)]
pub enum SignalKind {
    Entry,
    Exit,
    Block,
}

/// How a track end attaches to a point.
#[derive(Copy, Clone, PartialEq, Eq, Debug)]
pub enum PointLeg {
    Head,
    Left,
    Right,
    /// Plain track end; the point is not a real switch.
    End,
}

/// A switch, or a plain track endpoint. A real switch connects a head track
/// to a left and a right branch; its orientation decides which pair is
/// through-connected.
#[derive(Debug)]
pub struct Point {
    pub name: String,
    pub head: Option<TrackId>,
    pub left: Option<TrackId>,
    pub right: Option<TrackId>,
    pub is_switch: bool,
}

impl Point {
    /// A point connects two tracks iff both are among its legs and differ.
    /// A plain endpoint is never a routing decision point.
    pub fn connects(&self, a: TrackId, b: TrackId) -> bool {
        if a == b || !self.is_switch {
            return false;
        }
        let legs = [self.head, self.left, self.right];
        legs.contains(&Some(a)) && legs.contains(&Some(b))
    }

    /// The switch side that through-connects the two given tracks, or `None`
    /// if neither of them is the head leg.
    pub fn required_orientation(&self, a: TrackId, b: TrackId) -> Option<SwitchSide> {
        if a == b {
            return None;
        }
        if self.head == Some(a) {
            self.side_of(b)
        } else if self.head == Some(b) {
            self.side_of(a)
        } else {
            None
        }
    }

    fn side_of(&self, track: TrackId) -> Option<SwitchSide> {
        if self.left == Some(track) {
            Some(SwitchSide::Left)
        } else if self.right == Some(track) {
            Some(SwitchSide::Right)
        } else {
            None
        }
    }

    /// Tracks a train coming from `from` can continue onto across this point.
    pub fn successors(&self, from: TrackId) -> SmallVec<[TrackId; 2]> {
        let mut out = SmallVec::new();
        if !self.is_switch {
            return out;
        }
        if self.head == Some(from) {
            out.extend(self.left.into_iter());
            out.extend(self.right.into_iter());
        } else if self.left == Some(from) || self.right == Some(from) {
            out.extend(self.head.into_iter());
        }
        out
    }
}

/// A linear physical element, partitioned into segments by its signals.
#[derive(Debug)]
pub struct Track {
    pub name: String,
    pub total_length: f64,
    pub left_point: PointId,
    pub right_point: PointId,
    /// Ordered by position along the track.
    pub signals: SmallVec<[SignalId; 4]>,
    /// One more entry than `signals`.
    pub segment_lengths: SmallVec<[f64; 4]>,
}

impl Track {
    pub fn segment_count(&self) -> usize {
        self.signals.len() + 1
    }
}

#[derive(Debug)]
pub struct Signal {
    pub name: String,
    pub track: TrackId,
    /// Distance from the track's left end.
    pub position: f64,
    pub direction: SignalDirection,
    pub kind: SignalKind,
}

/// A signal-to-signal path reserved as a unit for one train's passage. The
/// track path is precomputed by the route-generating collaborator, ordered
/// from the start signal's track to the end signal's track.
#[derive(Debug)]
pub struct Route {
    pub name: String,
    pub start_signal: SignalId,
    pub end_signal: SignalId,
    pub tracks: SmallVec<[TrackId; 4]>,
}

/// The finalized point/track/signal graph with its candidate routes. Built
/// once by an external collaborator; immutable in shape afterwards.
#[derive(Debug, Default)]
pub struct Topology {
    pub points: Vec<Point>,
    pub tracks: Vec<Track>,
    pub signals: Vec<Signal>,
    pub routes: Vec<Route>,
}

impl Topology {
    pub fn new() -> Self {
        Default::default()
    }

    pub fn add_point(&mut self, name: &str) -> PointId {
        let id = self.points.len();
        self.points.push(Point {
            name: name.to_string(),
            head: None,
            left: None,
            right: None,
            is_switch: true,
        });
        id
    }

    /// Adds a track and wires both of its ends into the given point legs.
    pub fn add_track(
        &mut self,
        name: &str,
        total_length: f64,
        left: (PointId, PointLeg),
        right: (PointId, PointLeg),
    ) -> TrackId {
        let id = self.tracks.len();
        self.tracks.push(Track {
            name: name.to_string(),
            total_length,
            left_point: left.0,
            right_point: right.0,
            signals: SmallVec::new(),
            segment_lengths: SmallVec::from_slice(&[total_length]),
        });
        self.attach(left.0, left.1, id);
        self.attach(right.0, right.1, id);
        id
    }

    fn attach(&mut self, point: PointId, leg: PointLeg, track: TrackId) {
        let p = &mut self.points[point];
        match leg {
            PointLeg::Head => p.head = Some(track),
            PointLeg::Left => p.left = Some(track),
            PointLeg::Right => p.right = Some(track),
            PointLeg::End => {
                p.head = Some(track);
                p.is_switch = false;
            }
        }
    }

    /// Adds a signal, keeping the track's signal list ordered by position and
    /// re-deriving the track's segment partition.
    pub fn add_signal(
        &mut self,
        name: &str,
        track: TrackId,
        position: f64,
        direction: SignalDirection,
        kind: SignalKind,
    ) -> SignalId {
        let id = self.signals.len();
        self.signals.push(Signal {
            name: name.to_string(),
            track,
            position,
            direction,
            kind,
        });
        let idx = {
            let t = &self.tracks[track];
            t.signals
                .iter()
                .position(|&s| self.signals[s].position > position)
                .unwrap_or(t.signals.len())
        };
        self.tracks[track].signals.insert(idx, id);
        self.recompute_segments(track);
        id
    }

    fn recompute_segments(&mut self, track: TrackId) {
        let positions: SmallVec<[f64; 4]> = self.tracks[track]
            .signals
            .iter()
            .map(|&s| self.signals[s].position)
            .collect();
        let mut lengths = SmallVec::new();
        let mut prev = 0.0;
        for &p in &positions {
            lengths.push(p - prev);
            prev = p;
        }
        lengths.push(self.tracks[track].total_length - prev);
        self.tracks[track].segment_lengths = lengths;
    }

    pub fn add_route(
        &mut self,
        name: &str,
        start_signal: SignalId,
        end_signal: SignalId,
        tracks: &[TrackId],
    ) -> RouteId {
        let id = self.routes.len();
        self.routes.push(Route {
            name: name.to_string(),
            start_signal,
            end_signal,
            tracks: SmallVec::from_slice(tracks),
        });
        id
    }

    /// Index of a signal within its own track's ordered signal list.
    pub fn signal_index(&self, signal: SignalId) -> usize {
        let track = &self.tracks[self.signals[signal].track];
        track
            .signals
            .iter()
            .position(|&s| s == signal)
            .expect("signal not on its own track")
    }

    pub fn segment_length(&self, segment: SegmentId) -> f64 {
        self.tracks[segment.track].segment_lengths[segment.index]
    }

    pub fn segment_name(&self, segment: SegmentId) -> String {
        format!("{}-{}", self.tracks[segment.track].name, segment.index)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn segment_partition_follows_signal_spacing() {
        let mut topo = Topology::new();
        let a = topo.add_point("a");
        let b = topo.add_point("b");
        let t = topo.add_track("t", 500.0, (a, PointLeg::End), (b, PointLeg::End));
        topo.add_signal("s2", t, 400.0, SignalDirection::WithTrack, SignalKind::Exit);
        topo.add_signal("s1", t, 100.0, SignalDirection::WithTrack, SignalKind::Entry);

        assert_eq!(topo.tracks[t].segment_count(), 3);
        assert_eq!(&topo.tracks[t].segment_lengths[..], &[100.0, 300.0, 100.0]);
        // insertion kept position order even though s1 was added last
        assert_eq!(topo.signals[topo.tracks[t].signals[0]].name, "s1");
    }

    #[test]
    fn endpoint_is_no_decision_point() {
        let mut topo = Topology::new();
        let a = topo.add_point("a");
        let b = topo.add_point("b");
        let c = topo.add_point("c");
        let t0 = topo.add_track("t0", 100.0, (a, PointLeg::End), (b, PointLeg::Head));
        let t1 = topo.add_track("t1", 100.0, (b, PointLeg::Left), (c, PointLeg::End));

        assert!(topo.points[b].connects(t0, t1));
        assert!(!topo.points[a].connects(t0, t1));
        assert_eq!(
            topo.points[b].required_orientation(t0, t1),
            Some(SwitchSide::Left)
        );
        assert_eq!(topo.points[b].required_orientation(t1, t0), Some(SwitchSide::Left));
        assert_eq!(&topo.points[b].successors(t0)[..], &[t1]);
        assert_eq!(&topo.points[b].successors(t1)[..], &[t0]);
        assert!(topo.points[c].successors(t1).is_empty());
    }
}
