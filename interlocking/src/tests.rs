use crate::control::{overlap, points, tracks, World};
use crate::state::LockState;
use crate::topology::{PointId, PointLeg, RouteId, SignalDirection, SignalId, SwitchSide, TrackId};
use crate::*;

use std::collections::HashSet;
use std::sync::{Arc, Mutex};

use crate::topology::SignalDirection::{AgainstTrack, WithTrack};
use crate::topology::SignalKind::{Entry, Exit};

/// One entry track branching at a switch into two exit tracks:
///
/// ```text
/// pa ---t0--- w1 ---t1--- pb     (t1 on the left leg)
///               \--t2--- pc     (t2 on the right leg)
/// ```
struct BranchingStation {
    topology: Arc<Topology>,
    t0: TrackId,
    t1: TrackId,
    t2: TrackId,
    w1: PointId,
    s0: SignalId,
    r_main: RouteId,
    r_long: RouteId,
    r_branch: RouteId,
}

fn branching_station() -> BranchingStation {
    let mut topo = Topology::new();
    let pa = topo.add_point("pa");
    let w1 = topo.add_point("w1");
    let pb = topo.add_point("pb");
    let pc = topo.add_point("pc");
    let t0 = topo.add_track("t0", 500.0, (pa, PointLeg::End), (w1, PointLeg::Head));
    let t1 = topo.add_track("t1", 300.0, (w1, PointLeg::Left), (pb, PointLeg::End));
    let t2 = topo.add_track("t2", 300.0, (w1, PointLeg::Right), (pc, PointLeg::End));
    let s0 = topo.add_signal("s0", t0, 100.0, WithTrack, Entry);
    let s1 = topo.add_signal("s1", t0, 400.0, WithTrack, Exit);
    let s2 = topo.add_signal("s2", t1, 250.0, WithTrack, Exit);
    let s4 = topo.add_signal("s4", t1, 50.0, AgainstTrack, Entry);
    let s5 = topo.add_signal("s5", t2, 150.0, WithTrack, Exit);
    let r_main = topo.add_route("s0->s1", s0, s1, &[t0]);
    let r_long = topo.add_route("s0->s2", s0, s2, &[t0, t1]);
    let r_branch = topo.add_route("s4->s5", s4, s5, &[t1, t2]);
    BranchingStation {
        topology: Arc::new(topo),
        t0,
        t1,
        t2,
        w1,
        s0,
        r_main,
        r_long,
        r_branch,
    }
}

/// Two parallel entry tracks converging over a switch into one shared tail
/// track; the tail is both routes' braking overlap.
struct ConvergingJunction {
    topology: Arc<Topology>,
    ta: TrackId,
    tc: TrackId,
    pa: PointId,
    pw: PointId,
    sa1: SignalId,
    r1: RouteId,
    r2: RouteId,
}

fn converging_junction() -> ConvergingJunction {
    let mut topo = Topology::new();
    let pa = topo.add_point("pa");
    let pb = topo.add_point("pb");
    let pw = topo.add_point("pw");
    let pe = topo.add_point("pe");
    let ta = topo.add_track("ta", 500.0, (pa, PointLeg::End), (pw, PointLeg::Left));
    let tb = topo.add_track("tb", 500.0, (pb, PointLeg::End), (pw, PointLeg::Right));
    let tc = topo.add_track("tc", 300.0, (pw, PointLeg::Head), (pe, PointLeg::End));
    let sa1 = topo.add_signal("sa1", ta, 100.0, WithTrack, Entry);
    let sa2 = topo.add_signal("sa2", ta, 400.0, WithTrack, Exit);
    let sb1 = topo.add_signal("sb1", tb, 100.0, WithTrack, Entry);
    let sb2 = topo.add_signal("sb2", tb, 400.0, WithTrack, Exit);
    let r1 = topo.add_route("sa1->sa2", sa1, sa2, &[ta]);
    let r2 = topo.add_route("sb1->sb2", sb1, sb2, &[tb]);
    ConvergingJunction {
        topology: Arc::new(topo),
        ta,
        tc,
        pa,
        pw,
        sa1,
        r1,
        r2,
    }
}

struct RecordingProvider {
    commands: Arc<Mutex<Vec<String>>>,
}

impl InfrastructureProvider for RecordingProvider {
    fn set_point_orientation(&mut self, point: PointId, side: SwitchSide) {
        self.commands
            .lock()
            .unwrap()
            .push(format!("point {} {}", point, side));
    }

    fn set_signal_aspect(&mut self, signal: SignalId, aspect: SignalAspect, direction: SignalDirection) {
        self.commands
            .lock()
            .unwrap()
            .push(format!("signal {} {} {:?}", signal, aspect, direction));
    }
}

#[test]
fn overlap_length_policy() {
    assert_eq!(overlap::required_length(30), 0.0);
    assert_eq!(overlap::required_length(40), 50.0);
    assert_eq!(overlap::required_length(60), 100.0);
    assert_eq!(overlap::required_length(70), 200.0);
    assert_eq!(overlap::required_length(160), 200.0);
}

#[test]
fn points_of_route_follows_track_pairs() {
    let st = branching_station();
    let pts = points::points_of_route(&st.topology, st.r_long);
    assert_eq!(&pts[..], &[(st.w1, st.t0, st.t1)]);
    assert!(points::points_of_route(&st.topology, st.r_main).is_empty());
}

#[test]
fn locking_points_turns_and_reserves() {
    let st = branching_station();
    let mut world = World::new(st.topology.clone(), vec![]);
    points::lock(&mut world, st.r_long).unwrap();
    assert_eq!(world.state.points[st.w1].orientation, Some(SwitchSide::Left));
    assert_eq!(world.state.points[st.w1].lock, LockState::Reserved);
    assert!(!points::can_lock(&world, st.r_long));
}

#[test]
fn route_through_two_branch_legs_has_no_orientation() {
    let st = branching_station();
    let mut world = World::new(st.topology.clone(), vec![]);
    // t1 and t2 are both branch legs of w1; neither is the head track.
    assert_eq!(
        points::lock(&mut world, st.r_branch),
        Err(InterlockingError::AmbiguousOrientation {
            point: st.w1,
            track_in: st.t1,
            track_out: st.t2,
        })
    );
}

#[test]
fn segments_of_route_single_and_multi_track() {
    use maplit::hashset;
    let st = branching_station();

    // single track: only the segments between the two signals
    assert_eq!(
        tracks::segments_of_route(&st.topology, st.r_main),
        vec![SegmentId::new(st.t0, 1)]
    );

    // multi track: start signal to track end, then track start to end signal
    let set: HashSet<SegmentId> = tracks::segments_of_route(&st.topology, st.r_long)
        .into_iter()
        .collect();
    assert_eq!(
        set,
        hashset! {
            SegmentId::new(st.t0, 1),
            SegmentId::new(st.t0, 2),
            SegmentId::new(st.t1, 0),
            SegmentId::new(st.t1, 1),
        }
    );

    // against-track start signal walks its track towards index zero
    assert_eq!(
        tracks::segments_of_route(&st.topology, st.r_branch),
        vec![SegmentId::new(st.t1, 0), SegmentId::new(st.t2, 0)]
    );
}

#[test]
fn overlap_branches_into_successor_tracks() {
    let st = branching_station();
    // speed class 70 needs 200m, but only 100m remain behind s1 on t0
    let candidates = overlap::candidates(&st.topology, st.r_main, 70).unwrap();
    assert_eq!(candidates.len(), 2);
    for candidate in &candidates {
        assert!(candidate.is_satisfied());
        assert_eq!(candidate.required_length, 200.0);
        assert!(candidate.segments.contains(&SegmentId::new(st.t0, 2)));
        assert_eq!(&candidate.points[..], &[st.w1]);
    }
    assert!(candidates[0].visits_track(st.t1));
    assert!(candidates[1].visits_track(st.t2));
}

#[test]
fn slow_trains_need_no_overlap() {
    let st = branching_station();
    let candidates = overlap::candidates(&st.topology, st.r_main, 30).unwrap();
    assert_eq!(candidates.len(), 1);
    assert!(candidates[0].is_satisfied());
    assert!(candidates[0].segments.is_empty());
}

#[test]
fn overlap_search_degrades_to_longest_candidate() {
    let mut topo = Topology::new();
    let pa = topo.add_point("pa");
    let w1 = topo.add_point("w1");
    let pb = topo.add_point("pb");
    let t0 = topo.add_track("t0", 500.0, (pa, PointLeg::End), (w1, PointLeg::Head));
    let t1 = topo.add_track("t1", 50.0, (w1, PointLeg::Left), (pb, PointLeg::End));
    let s0 = topo.add_signal("s0", t0, 100.0, WithTrack, Entry);
    let s1 = topo.add_signal("s1", t0, 400.0, WithTrack, Exit);
    let route = topo.add_route("s0->s1", s0, s1, &[t0]);

    // 100m behind the signal plus all of t1 is still 50m short
    let candidates = overlap::candidates(&topo, route, 70).unwrap();
    assert_eq!(candidates.len(), 1);
    assert!(!candidates[0].is_satisfied());
    assert_eq!(candidates[0].missing_length, 50.0);
    assert!(candidates[0].visits_track(t1));

    // the degraded grant still goes through
    let mut il = Interlocking::new(Arc::new(topo), vec![]);
    assert!(il.set_route(route, &Train::new("ice1", 70)).unwrap());
    assert_eq!(
        il.state().segment(SegmentId::new(t1, 0)),
        SegmentState::ReservedOverlap
    );
}

#[test]
fn overlap_search_off_the_graph_edge_fails() {
    let mut topo = Topology::new();
    let pa = topo.add_point("pa");
    let pe = topo.add_point("pe");
    let t0 = topo.add_track("t0", 500.0, (pa, PointLeg::End), (pe, PointLeg::End));
    let s0 = topo.add_signal("s0", t0, 100.0, WithTrack, Entry);
    let s1 = topo.add_signal("s1", t0, 400.0, WithTrack, Exit);
    let route = topo.add_route("s0->s1", s0, s1, &[t0]);

    assert_eq!(
        overlap::candidates(&topo, route, 70),
        Err(InterlockingError::TopologyExhausted { route })
    );
}

#[test]
fn providers_receive_point_and_signal_commands() {
    let st = branching_station();
    let commands = Arc::new(Mutex::new(Vec::new()));
    let provider = RecordingProvider {
        commands: commands.clone(),
    };
    let mut il = Interlocking::new(st.topology.clone(), vec![Box::new(provider)]);
    assert!(il.set_route(st.r_main, &Train::new("ice1", 70)).unwrap());

    let commands = commands.lock().unwrap();
    assert!(commands.contains(&format!("point {} left", st.w1)));
    assert!(commands.contains(&format!("signal {} go WithTrack", st.s0)));
}

#[test]
fn overlapping_routes_share_their_overlap() {
    let junction = converging_junction();
    let mut il = Interlocking::new(junction.topology.clone(), vec![]);
    let shared = SegmentId::new(junction.tc, 0);

    // the shared overlap tail does not make the routes collide
    assert!(!il.do_two_routes_collide(junction.r1, junction.r2));
    assert_eq!(
        il.do_two_routes_collide(junction.r1, junction.r2),
        il.do_two_routes_collide(junction.r2, junction.r1)
    );

    assert!(il.set_route(junction.r1, &Train::new("a", 70)).unwrap());
    assert!(il.can_route_be_set(junction.r2));
    assert!(il.set_route(junction.r2, &Train::new("b", 70)).unwrap());

    assert_eq!(il.state().segment(shared), SegmentState::ReservedOverlap);
    assert_eq!(il.state().points[junction.pw].lock, LockState::ReservedOverlap);

    // releasing one route must not free the other's overlap
    il.free_route(junction.r1).unwrap();
    assert_eq!(il.state().segment(shared), SegmentState::ReservedOverlap);
    assert_eq!(il.state().points[junction.pw].lock, LockState::ReservedOverlap);

    il.free_route(junction.r2).unwrap();
    assert_eq!(il.state().segment(shared), SegmentState::Free);
    assert_eq!(il.state().points[junction.pw].lock, LockState::Free);

    assert_eq!(
        il.free_route(junction.r1),
        Err(InterlockingError::RouteNotActive { route: junction.r1 })
    );
}

#[test]
fn colliding_routes_are_detected_symmetrically() {
    let st = branching_station();
    let il = Interlocking::new(st.topology.clone(), vec![]);

    // shared segment on t0
    assert!(il.do_two_routes_collide(st.r_main, st.r_long));
    // disjoint paths, but every overlap of r_main crosses r_branch's path
    assert!(il.do_two_routes_collide(st.r_main, st.r_branch));

    for (a, b) in &[(st.r_main, st.r_long), (st.r_main, st.r_branch)] {
        assert_eq!(il.do_two_routes_collide(*a, *b), il.do_two_routes_collide(*b, *a));
    }
}

#[test]
fn occupation_forces_protecting_signal_to_halt() {
    let junction = converging_junction();
    let mut il = Interlocking::new(junction.topology.clone(), vec![]);
    let segment = SegmentId::new(junction.ta, 1);

    assert!(il.set_route(junction.r1, &Train::new("a", 70)).unwrap());
    assert_eq!(il.state().signals[junction.sa1], SignalAspect::Go);

    il.count_in(segment, "a");
    assert_eq!(il.state().segment(segment), SegmentState::Occupied);
    assert_eq!(il.state().signals[junction.sa1], SignalAspect::Halt);

    // a second train detected on the same segment keeps it occupied through
    // the first count-out
    il.count_in(segment, "b");
    il.count_out(segment, "a").unwrap();
    assert_eq!(il.state().segment(segment), SegmentState::Occupied);
    il.count_out(segment, "b").unwrap();
    assert_eq!(il.state().segment(segment), SegmentState::Free);

    assert_eq!(
        il.count_out(segment, "b"),
        Err(InterlockingError::UnknownSegmentOccupancy { segment })
    );
}

#[test]
fn freeing_trailing_extremity_frees_boundary_point() {
    let junction = converging_junction();
    let mut il = Interlocking::new(junction.topology.clone(), vec![]);
    // segment ahead of the start signal, where the train is first detected
    let segment = SegmentId::new(junction.ta, 0);

    assert!(il.set_route(junction.r1, &Train::new("a", 70)).unwrap());
    il.count_in(segment, "a");
    il.count_out(segment, "a").unwrap();
    assert_eq!(il.state().segment(segment), SegmentState::Free);
    assert_eq!(il.state().points[junction.pa].lock, LockState::Free);
}

#[test]
fn vacating_without_active_route_is_a_consistency_violation() {
    let junction = converging_junction();
    let mut il = Interlocking::new(junction.topology.clone(), vec![]);
    let segment = SegmentId::new(junction.ta, 0);

    il.count_in(segment, "ghost");
    assert_eq!(
        il.count_out(segment, "ghost"),
        Err(InterlockingError::ActiveRouteNotFound { segment })
    );
}

#[test]
fn reset_restores_every_resource() {
    let junction = converging_junction();
    let mut il = Interlocking::new(junction.topology.clone(), vec![]);
    assert!(il.set_route(junction.r1, &Train::new("a", 70)).unwrap());
    il.count_in(SegmentId::new(junction.ta, 1), "a");

    il.reset();

    let state = il.state();
    for point in &state.points {
        assert_eq!(point.orientation, None);
        assert_eq!(point.lock, LockState::Free);
    }
    for track in &state.segments {
        for segment in track {
            assert_eq!(*segment, SegmentState::Free);
        }
    }
    for aspect in &state.signals {
        assert_eq!(*aspect, SignalAspect::Halt);
    }
    assert!(state.active.is_empty());
    assert!(state.segment_owner.is_empty());
    assert!(state.overlap_segment_refs.is_empty());
    assert!(state.overlap_point_refs.is_empty());
    assert!(state.occupancy.is_empty());
}

#[test]
fn engine_serializes_operations_and_reports_blocked_routes() {
    let st = branching_station();
    let il = Interlocking::new(st.topology.clone(), vec![]);
    let (queue, handle) = spawn(il);

    assert_eq!(
        queue
            .submit(Operation::SetRoute {
                route: st.r_main,
                train: Train::new("ice1", 70),
            })
            .unwrap(),
        Outcome::Completed
    );

    // r_long shares t0-1 with the now-active r_main
    assert_eq!(
        queue
            .submit(Operation::SetRoute {
                route: st.r_long,
                train: Train::new("re2", 70),
            })
            .unwrap(),
        Outcome::RouteBlocked
    );

    let segment = SegmentId::new(st.t0, 1);
    for train in &["ice1", "ice2"] {
        queue
            .submit(Operation::DetectIn {
                segment,
                train: train.to_string(),
            })
            .unwrap();
    }
    queue
        .submit(Operation::DetectOut {
            segment,
            train: "ice1".to_string(),
        })
        .unwrap();

    match queue.submit(Operation::PrintState).unwrap() {
        Outcome::State(dump) => assert!(dump.contains("t0-1: occupied")),
        other => panic!("unexpected outcome {:?}", other),
    }

    // counting out a train that never was counted in surfaces the failure,
    // but the engine keeps consuming
    assert!(queue
        .submit(Operation::DetectOut {
            segment: SegmentId::new(st.t2, 0),
            train: "ghost".to_string(),
        })
        .is_err());

    queue
        .submit(Operation::DetectOut {
            segment,
            train: "ice2".to_string(),
        })
        .unwrap();

    assert_eq!(queue.submit(Operation::Shutdown).unwrap(), Outcome::Completed);
    let il = handle.join().unwrap();
    assert_eq!(il.state().active.len(), 1);
    // the first detection behind s0 forced it to halt, and nothing clears it
    // automatically
    assert_eq!(il.state().signals[st.s0], SignalAspect::Halt);
    assert_eq!(il.state().segment(segment), SegmentState::Free);
    // r_main's overlap is still in force
    assert_eq!(
        il.state().segment(SegmentId::new(st.t0, 2)),
        SegmentState::ReservedOverlap
    );
}

#[test]
fn dump_state_lists_all_resources() {
    let st = branching_station();
    let il = Interlocking::new(st.topology.clone(), vec![]);
    let dump = il.dump_state();
    assert!(dump.contains("w1: free (orientation: undefined)"));
    assert!(dump.contains("t0-0: free"));
    assert!(dump.contains("s0: halt"));
    assert!(dump.contains("Active routes:"));
}
