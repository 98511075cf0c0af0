//! Integration tests for the timing document: interval resolution,
//! sync-base propagation, restart/repeat/fill, containers, seeking.

use tempora_timing_core::{
    AnimationFunction, CalcMode, Config, ElementId, ElementState, Fill, RefValues, Restart,
    Schedule, Segment, TimeValue, TimingError, TimingEvent, ValueBuf, ValueSegment,
};

fn sched() -> Schedule {
    Schedule::new(Config::default())
}

/// A leaf attached under the root with one begin offset.
fn leaf(s: &mut Schedule, name: &str, begin_ms: i64) -> ElementId {
    let id = s.add_element(name);
    s.attach_child(s.root(), id).unwrap();
    s.add_offset_condition(id, true, begin_ms).unwrap();
    id
}

fn scalar_segment(a: f32, b: f32) -> Segment {
    Segment::Value(ValueSegment::new(ValueBuf::scalar(a), ValueBuf::scalar(b)).unwrap())
}

fn scalar_anim(target: &str, a: f32, b: f32) -> AnimationFunction {
    let rv = RefValues::new(vec![scalar_segment(a, b)]).unwrap();
    AnimationFunction::new(target, rv, CalcMode::Linear).unwrap()
}

/// it should treat the activation window as half-open: active at begin and
/// at end-1, inactive at end
#[test]
fn interval_window_is_half_open() {
    let mut s = sched();
    let e = leaf(&mut s, "e", 1000);
    s.add_offset_condition(e, false, 4000).unwrap();

    s.sample(0).unwrap();
    assert!(!s.is_active(e).unwrap());
    assert_eq!(
        s.current_interval(e).unwrap(),
        Some((TimeValue::Resolved(1000), TimeValue::Resolved(4000)))
    );

    s.sample(1000).unwrap();
    assert!(s.is_active(e).unwrap());
    assert_eq!(s.simple_time(e).unwrap(), 0);

    s.sample(3999).unwrap();
    assert!(s.is_active(e).unwrap());
    assert_eq!(s.simple_time(e).unwrap(), 2999);

    s.sample(4000).unwrap();
    assert!(!s.is_active(e).unwrap());
    assert_eq!(s.element_state(e).unwrap(), ElementState::PostActive);
}

/// it should emit began/ended events around the window
#[test]
fn interval_lifecycle_events() {
    let mut s = sched();
    let e = leaf(&mut s, "e", 1000);
    s.add_offset_condition(e, false, 2000).unwrap();

    let out = s.sample(1000).unwrap();
    assert!(out
        .events
        .contains(&TimingEvent::IntervalBegan { element: e, begin: 1000 }));

    let out = s.sample(2000).unwrap();
    assert!(out
        .events
        .contains(&TimingEvent::IntervalEnded { element: e, time: 2000 }));
}

/// it should pin a begin sync-base condition to the source begin plus offset
#[test]
fn sync_base_begin_pins_to_source() {
    let mut s = sched();
    let a = leaf(&mut s, "a", 1000);
    let b = s.add_element("b");
    s.attach_child(s.root(), b).unwrap();
    s.add_sync_base_condition(b, true, a, 500).unwrap();

    assert_eq!(
        s.instance_times(b, true).unwrap(),
        vec![TimeValue::Resolved(1500)]
    );
    s.sample(1500).unwrap();
    assert!(s.is_active(b).unwrap());
}

/// it should recompute a dependent end instance when the source end moves
#[test]
fn end_change_propagates_to_dependents() {
    let mut s = sched();
    let a = leaf(&mut s, "a", 1000);
    s.add_offset_condition(a, false, 3000).unwrap();
    let c = leaf(&mut s, "c", 0);
    s.add_sync_base_condition(c, false, a, 0).unwrap();
    assert_eq!(
        s.instance_times(c, false).unwrap(),
        vec![TimeValue::Resolved(3000)]
    );

    // An earlier explicit end on `a` firms its interval up to 2000 and
    // must move `c`'s derived end instance with it, leaving one instance.
    s.add_offset_condition(a, false, 2000).unwrap();
    assert_eq!(
        s.current_interval(a).unwrap(),
        Some((TimeValue::Resolved(1000), TimeValue::Resolved(2000)))
    );
    assert_eq!(
        s.instance_times(c, false).unwrap(),
        vec![TimeValue::Resolved(2000)]
    );
}

/// it should resolve an acyclic sync chain ten elements deep
#[test]
fn sync_chain_resolves_without_depth_error() {
    let mut s = sched();
    let mut prev = leaf(&mut s, "e0", 0);
    let mut last = prev;
    for i in 1..10 {
        let e = s.add_element(&format!("e{i}"));
        s.attach_child(s.root(), e).unwrap();
        s.add_sync_base_condition(e, true, prev, 100).unwrap();
        prev = e;
        last = e;
    }
    s.sample(0).unwrap();
    assert_eq!(
        s.instance_times(last, true).unwrap(),
        vec![TimeValue::Resolved(900)]
    );
    s.sample(900).unwrap();
    assert!(s.is_active(last).unwrap());
}

/// it should report a too-deep cascade instead of recursing forever
#[test]
fn propagation_depth_is_bounded() {
    let mut s = Schedule::new(Config {
        max_propagation_depth: 4,
        ..Config::default()
    });
    let mut prev = leaf(&mut s, "e0", 0);
    for i in 1..10 {
        let e = s.add_element(&format!("e{i}"));
        s.attach_child(s.root(), e).unwrap();
        s.add_sync_base_condition(e, true, prev, 100).unwrap();
        prev = e;
    }
    // The first sample rebuilds the whole chain in one cascade, which is
    // where the bound trips.
    assert!(matches!(
        s.sample(0),
        Err(TimingError::PropagationDepthExceeded { .. })
    ));
}

/// it should truncate the active interval at a later begin under
/// restart="always"
#[test]
fn restart_always_truncates_mid_window() {
    let mut s = sched();
    let e = leaf(&mut s, "e", 1000);
    s.add_offset_condition(e, true, 2000).unwrap();
    s.set_simple_duration(e, TimeValue::Resolved(1500)).unwrap();

    s.sample(1500).unwrap();
    assert!(s.is_active(e).unwrap());
    assert_eq!(s.simple_time(e).unwrap(), 500);

    // The 2000ms begin cuts [1000, 2500) short and opens [2000, 3500).
    s.sample(2000).unwrap();
    assert!(s.is_active(e).unwrap());
    assert_eq!(s.simple_time(e).unwrap(), 0);
    assert_eq!(
        s.current_interval(e).unwrap(),
        Some((TimeValue::Resolved(2000), TimeValue::Resolved(3500)))
    );
}

/// it should ignore mid-window begins under restart="whenNotActive" and
/// drop them once the window has passed
#[test]
fn restart_when_not_active_ignores_mid_window_begin() {
    let mut s = sched();
    let e = leaf(&mut s, "e", 1000);
    s.add_offset_condition(e, true, 2000).unwrap();
    s.set_simple_duration(e, TimeValue::Resolved(1500)).unwrap();
    s.set_restart(e, Restart::WhenNotActive).unwrap();

    s.sample(2000).unwrap();
    assert!(s.is_active(e).unwrap());
    assert_eq!(s.simple_time(e).unwrap(), 1000);

    // 2000ms is before the old end, so it cannot seed a new interval.
    s.sample(2500).unwrap();
    assert!(!s.is_active(e).unwrap());
}

/// it should run exactly one interval under restart="never" until reset
/// restores eligibility
#[test]
fn restart_never_blocks_until_reset() {
    let mut s = sched();
    let e = leaf(&mut s, "e", 1000);
    s.add_offset_condition(e, true, 3000).unwrap();
    s.set_simple_duration(e, TimeValue::Resolved(1500)).unwrap();
    s.set_restart(e, Restart::Never).unwrap();

    s.sample(1500).unwrap();
    assert!(s.is_active(e).unwrap());
    s.sample(2600).unwrap();
    assert_eq!(s.element_state(e).unwrap(), ElementState::PostActive);
    s.sample(3200).unwrap();
    assert!(!s.is_active(e).unwrap());

    s.reset(e).unwrap();
    s.sample(1200).unwrap();
    assert!(s.is_active(e).unwrap());
}

/// it should report frozen only for fill="freeze" after the interval ends
#[test]
fn fill_freeze_reports_frozen() {
    let mut s = sched();
    let e = leaf(&mut s, "e", 0);
    s.set_simple_duration(e, TimeValue::Resolved(1000)).unwrap();
    s.set_fill(e, Fill::Freeze).unwrap();
    let r = leaf(&mut s, "r", 0);
    s.set_simple_duration(r, TimeValue::Resolved(1000)).unwrap();

    s.sample(1500).unwrap();
    assert!(s.is_frozen(e).unwrap());
    assert!(!s.is_frozen(r).unwrap());
}

/// it should track iteration and simple time across a fractional repeat
/// count and end at the intrinsic active duration
#[test]
fn repeat_count_bounds_activity() {
    let mut s = sched();
    let e = leaf(&mut s, "e", 0);
    s.set_simple_duration(e, TimeValue::Resolved(1000)).unwrap();
    s.set_repeat_count(e, Some(2.5)).unwrap();

    s.sample(0).unwrap();
    assert_eq!(s.iteration(e).unwrap(), 0);

    let out = s.sample(1100).unwrap();
    assert!(out
        .events
        .contains(&TimingEvent::Repeat { element: e, iteration: 1 }));
    assert_eq!(s.iteration(e).unwrap(), 1);
    assert_eq!(s.simple_time(e).unwrap(), 100);

    s.sample(2400).unwrap();
    assert_eq!(s.iteration(e).unwrap(), 2);
    assert_eq!(s.simple_time(e).unwrap(), 400);

    s.sample(2500).unwrap();
    assert!(!s.is_active(e).unwrap());
}

/// it should begin a listener from a repeat notification matching its
/// iteration filter
#[test]
fn repeat_condition_fires_on_matching_iteration() {
    let mut s = sched();
    let src = leaf(&mut s, "src", 0);
    s.set_simple_duration(src, TimeValue::Resolved(1000)).unwrap();
    s.set_repeat_count(src, Some(3.0)).unwrap();
    let b = s.add_element("b");
    s.attach_child(s.root(), b).unwrap();
    s.add_repeat_condition(b, true, src, 2, 0).unwrap();

    s.sample(0).unwrap();
    assert!(s.instance_times(b, true).unwrap().is_empty());

    // Iterations 1 and 2 both start this tick; only 2 matches the filter.
    s.sample(2000).unwrap();
    assert_eq!(
        s.instance_times(b, true).unwrap(),
        vec![TimeValue::Resolved(2000)]
    );
    assert!(s.is_active(b).unwrap());
}

/// it should feed delivered events into event conditions with their offset
#[test]
fn delivered_event_begins_listener() {
    let mut s = sched();
    let src = leaf(&mut s, "src", 0);
    let b = s.add_element("b");
    s.attach_child(s.root(), b).unwrap();
    s.add_event_condition(b, true, src, 500).unwrap();

    s.sample(0).unwrap();
    s.deliver_event(src, 1000).unwrap();
    assert_eq!(
        s.instance_times(b, true).unwrap(),
        vec![TimeValue::Resolved(1500)]
    );
    s.sample(1500).unwrap();
    assert!(s.is_active(b).unwrap());
}

/// it should sample children at the container's simple time
#[test]
fn container_cascades_local_time() {
    let mut s = sched();
    let c = s.add_container("c");
    s.attach_child(s.root(), c).unwrap();
    s.add_offset_condition(c, true, 1000).unwrap();
    let l = s.add_element("l");
    s.attach_child(c, l).unwrap();
    s.add_offset_condition(l, true, 500).unwrap();
    s.add_offset_condition(l, false, 1000).unwrap();

    s.sample(1400).unwrap();
    assert!(s.is_active(c).unwrap());
    assert!(!s.is_active(l).unwrap());

    s.sample(1600).unwrap();
    assert!(s.is_active(l).unwrap());
    assert_eq!(s.simple_time(l).unwrap(), 100);

    s.sample(2100).unwrap();
    assert!(!s.is_active(l).unwrap());
}

/// it should end and re-initialize children at each container iteration
#[test]
fn container_repeat_restarts_children() {
    let mut s = sched();
    let c = s.add_container("c");
    s.attach_child(s.root(), c).unwrap();
    s.add_offset_condition(c, true, 0).unwrap();
    s.set_simple_duration(c, TimeValue::Resolved(1000)).unwrap();
    s.set_repeat_count(c, Some(2.0)).unwrap();
    let l = s.add_element("l");
    s.attach_child(c, l).unwrap();
    s.add_offset_condition(l, true, 200).unwrap();

    s.sample(300).unwrap();
    assert!(s.is_active(l).unwrap());
    assert_eq!(s.simple_time(l).unwrap(), 100);

    s.sample(1300).unwrap();
    assert_eq!(s.iteration(c).unwrap(), 1);
    assert!(s.is_active(l).unwrap());
    assert_eq!(s.simple_time(l).unwrap(), 100);

    s.sample(2000).unwrap();
    assert!(!s.is_active(c).unwrap());
}

/// it should leave no instance time referencing an interval pruned by a
/// container reset
#[test]
fn reset_detaches_sync_dependents() {
    let mut s = sched();
    let c = s.add_container("c");
    s.attach_child(s.root(), c).unwrap();
    s.add_offset_condition(c, true, 0).unwrap();
    let l = s.add_element("l");
    s.attach_child(c, l).unwrap();
    s.add_offset_condition(l, true, 100).unwrap();
    let x = s.add_element("x");
    s.attach_child(s.root(), x).unwrap();
    s.add_sync_base_condition(x, true, l, 0).unwrap();

    s.sample(200).unwrap();
    assert!(s.is_active(l).unwrap());
    assert_eq!(
        s.instance_times(x, true).unwrap(),
        vec![TimeValue::Resolved(100)]
    );

    s.reset(c).unwrap();
    assert_eq!(s.current_interval(l).unwrap(), None);
    assert!(s.instance_times(x, true).unwrap().is_empty());
    assert_eq!(s.element_state(l).unwrap(), ElementState::Waiting);
}

/// it should seek forward and backward, unwinding state on the way back
#[test]
fn seek_forward_and_backward() {
    let mut s = sched();
    let e = leaf(&mut s, "e", 1000);
    s.set_simple_duration(e, TimeValue::Resolved(1000)).unwrap();

    s.sample(0).unwrap();
    let out = s.seek_to(TimeValue::Resolved(1500)).unwrap();
    assert!(out
        .events
        .contains(&TimingEvent::Seeked { time: 1500, backward: false }));
    assert!(s.is_active(e).unwrap());
    assert_eq!(s.simple_time(e).unwrap(), 500);

    let out = s.seek_to(TimeValue::Resolved(500)).unwrap();
    assert!(out
        .events
        .contains(&TimingEvent::Seeked { time: 500, backward: true }));
    assert!(!s.is_active(e).unwrap());
    assert_eq!(s.element_state(e).unwrap(), ElementState::Waiting);

    s.sample(1200).unwrap();
    assert!(s.is_active(e).unwrap());

    assert!(matches!(
        s.seek_to(TimeValue::Indefinite),
        Err(TimingError::SeekUnresolved)
    ));
}

/// it should map local time to wall clock once the root has begun
#[test]
fn wall_clock_mapping() {
    let mut s = sched();
    leaf(&mut s, "e", 0);
    assert_eq!(s.to_wall_clock(0), None);
    s.note_wall_clock(5_000_000);
    s.sample(0).unwrap();
    assert_eq!(s.to_wall_clock(250), Some(5_000_250));
}

/// it should publish interpolated changes for active animated leaves
#[test]
fn active_leaf_emits_changes() {
    let mut s = sched();
    let e = leaf(&mut s, "e", 0);
    s.set_simple_duration(e, TimeValue::Resolved(1000)).unwrap();
    s.set_animation(e, scalar_anim("node/x", 0.0, 10.0)).unwrap();

    let out = s.sample(500).unwrap();
    assert_eq!(out.changes.len(), 1);
    assert_eq!(out.changes[0].key, "node/x");
    assert!((out.changes[0].value.get(0, 0) - 5.0).abs() < 1e-5);

    let out = s.sample(1000).unwrap();
    assert!(out.changes.is_empty());
}

/// it should bind targets once, keying changes by the resolved handle and
/// disabling unresolvable animations
#[test]
fn prebind_resolves_or_disables() {
    let mut s = sched();
    let a = leaf(&mut s, "a", 0);
    s.set_simple_duration(a, TimeValue::Resolved(1000)).unwrap();
    s.set_animation(a, scalar_anim("node/x", 0.0, 1.0)).unwrap();
    let b = leaf(&mut s, "b", 0);
    s.set_simple_duration(b, TimeValue::Resolved(1000)).unwrap();
    s.set_animation(b, scalar_anim("node/missing", 0.0, 1.0))
        .unwrap();

    let mut resolver = |path: &str| {
        if path == "node/x" {
            Some("h1".to_string())
        } else {
            None
        }
    };
    s.prebind(&mut resolver);

    let out = s.sample(500).unwrap();
    assert_eq!(out.changes.len(), 1);
    assert_eq!(out.changes[0].key, "h1");
}

/// it should serialize outputs for transport by adapters
#[test]
fn outputs_serialize_for_transport() {
    let mut s = sched();
    let e = leaf(&mut s, "e", 0);
    s.set_simple_duration(e, TimeValue::Resolved(1000)).unwrap();
    s.set_animation(e, scalar_anim("node/x", 0.0, 10.0)).unwrap();

    let out = s.sample(500).unwrap();
    let json = serde_json::to_string(out).unwrap();
    let back: tempora_timing_core::Outputs = serde_json::from_str(&json).unwrap();
    assert_eq!(back.changes.len(), out.changes.len());
    assert_eq!(back.events, out.events);
}

/// it should reject malformed document edits
#[test]
fn construction_errors() {
    let mut s = sched();
    let e = s.add_element("e");
    let c = s.add_container("c");
    let root = s.root();

    assert!(matches!(
        s.set_simple_duration(root, TimeValue::Resolved(10)),
        Err(TimingError::RootSimpleDurationFixed)
    ));
    assert!(matches!(
        s.attach_child(c, root),
        Err(TimingError::RootHasNoParent)
    ));
    assert!(matches!(
        s.attach_child(e, c),
        Err(TimingError::NotAContainer { .. })
    ));
    s.attach_child(c, e).unwrap();
    assert!(matches!(
        s.attach_child(root, e),
        Err(TimingError::ChildAlreadyAttached { .. })
    ));
    assert!(matches!(
        s.set_animation(c, scalar_anim("x", 0.0, 1.0)),
        Err(TimingError::AnimationOnContainer { .. })
    ));
}
