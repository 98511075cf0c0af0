//! Schedule: data ownership and the sampling/propagation machinery.
//!
//! The schedule is the arena behind a whole timing document: it owns every
//! timed element, every interval and every instance time, and all
//! cross-element mutation (sync-base notification, pruning, container
//! cascades) flows through it by id. Sampling is single-threaded and
//! synchronous; a cascade that exceeds the configured depth is reported as
//! a cyclic dependency graph instead of recursing forever.

use log::{debug, trace, warn};

use crate::anim::AnimationFunction;
use crate::binding::TargetResolver;
use crate::condition::{Condition, ConditionKind};
use crate::config::Config;
use crate::element::{ElementKind, ElementState, Fill, Restart, TimedElement};
use crate::error::TimingError;
use crate::ids::{ElementId, IdAllocator, InstanceId, IntervalId};
use crate::instance::{sort_instances, InstanceOrigin, InstanceTime};
use crate::interval::Interval;
use crate::outputs::{Change, Outputs, TimingEvent};
use crate::time::TimeValue;
use tempora_value_core::ValueBuf;

/// Safety bound on interval chaining within one sample of one element.
const MAX_TRANSITIONS_PER_SAMPLE: usize = 1000;

/// The timing document: a root container plus the arenas behind it.
#[derive(Debug)]
pub struct Schedule {
    cfg: Config,
    ids: IdAllocator,
    elements: Vec<TimedElement>,
    intervals: Vec<Option<Interval>>,
    root: ElementId,

    // Per-tick outputs and the reusable compute buffer.
    outputs: Outputs,
    scratch: ValueBuf,

    // Root bookkeeping: seek state and wall-clock mapping.
    seeking: bool,
    seeking_back: bool,
    last_sample: TimeValue,
    begin_wall_clock: Option<i64>,
    pending_wall_clock: Option<i64>,
}

impl Schedule {
    /// Create a schedule with its root container. The root begins at local
    /// time zero and never ends on its own.
    pub fn new(cfg: Config) -> Self {
        let mut ids = IdAllocator::new();
        let root_id = ids.alloc_element();
        let mut root = TimedElement::new(root_id, "root".into(), ElementKind::Root);
        root.conditions.push(Condition {
            is_begin: true,
            kind: ConditionKind::Offset { offset: 0 },
        });
        root.begin_instances.push(InstanceTime {
            id: ids.alloc_instance(),
            time: TimeValue::Resolved(0),
            origin: InstanceOrigin::Offset,
        });

        let mut elements = Vec::with_capacity(cfg.element_capacity);
        elements.push(root);
        Self {
            intervals: Vec::with_capacity(cfg.interval_capacity),
            cfg,
            ids,
            elements,
            root: root_id,
            outputs: Outputs::default(),
            scratch: ValueBuf::default(),
            seeking: false,
            seeking_back: false,
            last_sample: TimeValue::Unresolved,
            begin_wall_clock: None,
            pending_wall_clock: None,
        }
    }

    #[inline]
    pub fn root(&self) -> ElementId {
        self.root
    }

    #[inline]
    pub fn outputs(&self) -> &Outputs {
        &self.outputs
    }

    // ---- arena access -------------------------------------------------

    fn el(&self, id: ElementId) -> Result<&TimedElement, TimingError> {
        self.elements
            .get(id.0 as usize)
            .ok_or(TimingError::UnknownElement { id: id.0 })
    }

    fn el_mut(&mut self, id: ElementId) -> Result<&mut TimedElement, TimingError> {
        self.elements
            .get_mut(id.0 as usize)
            .ok_or(TimingError::UnknownElement { id: id.0 })
    }

    fn iv(&self, id: IntervalId) -> Option<&Interval> {
        self.intervals.get(id.0 as usize).and_then(|s| s.as_ref())
    }

    fn iv_mut(&mut self, id: IntervalId) -> Option<&mut Interval> {
        self.intervals.get_mut(id.0 as usize).and_then(|s| s.as_mut())
    }

    fn check_depth(&self, depth: usize) -> Result<(), TimingError> {
        if depth > self.cfg.max_propagation_depth {
            Err(TimingError::PropagationDepthExceeded { depth })
        } else {
            Ok(())
        }
    }

    // ---- document construction ----------------------------------------

    pub fn add_element(&mut self, name: &str) -> ElementId {
        self.add_node(name, ElementKind::Leaf)
    }

    pub fn add_container(&mut self, name: &str) -> ElementId {
        self.add_node(name, ElementKind::Container)
    }

    fn add_node(&mut self, name: &str, kind: ElementKind) -> ElementId {
        let id = self.ids.alloc_element();
        self.elements
            .push(TimedElement::new(id, name.to_string(), kind));
        id
    }

    /// Attach `child` under `parent` in document order. The root can never
    /// be a child; a child belongs to at most one container.
    pub fn attach_child(&mut self, parent: ElementId, child: ElementId) -> Result<(), TimingError> {
        if child == self.root {
            return Err(TimingError::RootHasNoParent);
        }
        if !self.el(parent)?.is_container() {
            return Err(TimingError::NotAContainer { id: parent.0 });
        }
        let c = self.el_mut(child)?;
        if c.parent.is_some() {
            return Err(TimingError::ChildAlreadyAttached { id: child.0 });
        }
        c.parent = Some(parent);
        self.el_mut(parent)?.children.push(child);
        Ok(())
    }

    pub fn set_simple_duration(
        &mut self,
        element: ElementId,
        dur: TimeValue,
    ) -> Result<(), TimingError> {
        if element == self.root {
            return Err(TimingError::RootSimpleDurationFixed);
        }
        self.el_mut(element)?.simple_dur = dur;
        Ok(())
    }

    pub fn set_repeat_count(
        &mut self,
        element: ElementId,
        count: Option<f32>,
    ) -> Result<(), TimingError> {
        self.el_mut(element)?.repeat_count = count;
        Ok(())
    }

    pub fn set_repeat_duration(
        &mut self,
        element: ElementId,
        dur: TimeValue,
    ) -> Result<(), TimingError> {
        self.el_mut(element)?.repeat_dur = dur;
        Ok(())
    }

    pub fn set_restart(&mut self, element: ElementId, restart: Restart) -> Result<(), TimingError> {
        self.el_mut(element)?.restart = restart;
        Ok(())
    }

    pub fn set_fill(&mut self, element: ElementId, fill: Fill) -> Result<(), TimingError> {
        self.el_mut(element)?.fill = fill;
        Ok(())
    }

    /// Attach an animation function to a leaf element.
    pub fn set_animation(
        &mut self,
        element: ElementId,
        anim: AnimationFunction,
    ) -> Result<(), TimingError> {
        let el = self.el_mut(element)?;
        if el.is_container() {
            return Err(TimingError::AnimationOnContainer { id: element.0 });
        }
        el.anim = Some(anim);
        Ok(())
    }

    /// Fixed offset from the container begin. Inserts its one instance time
    /// immediately; it is never recomputed and survives reset.
    pub fn add_offset_condition(
        &mut self,
        owner: ElementId,
        is_begin: bool,
        offset_ms: i64,
    ) -> Result<(), TimingError> {
        let el = self.el_mut(owner)?;
        el.conditions.push(Condition {
            is_begin,
            kind: ConditionKind::Offset { offset: offset_ms },
        });
        self.insert_instance(
            owner,
            is_begin,
            TimeValue::Resolved(offset_ms),
            InstanceOrigin::Offset,
        )?;
        self.reevaluate_element(owner, 0)
    }

    /// Track another element's interval boundary: a begin-list condition
    /// follows the sync-base's begin, an end-list condition its end.
    pub fn add_sync_base_condition(
        &mut self,
        owner: ElementId,
        is_begin: bool,
        syncbase: ElementId,
        offset_ms: i64,
    ) -> Result<(), TimingError> {
        self.el(owner)?;
        self.el(syncbase)?;
        let idx = {
            let el = self.el_mut(owner)?;
            el.conditions.push(Condition {
                is_begin,
                kind: ConditionKind::SyncBase {
                    syncbase,
                    offset: offset_ms,
                },
            });
            el.conditions.len() - 1
        };
        // Pin to the sync-base's most recent interval, if one exists.
        let source = self.el(syncbase)?;
        if let Some(iid) = source.current_interval.or(source.prev_interval) {
            if let Some(iv) = self.iv(iid) {
                let boundary = if is_begin { iv.begin() } else { iv.end() };
                self.insert_instance(
                    owner,
                    is_begin,
                    boundary.offset_by(offset_ms),
                    InstanceOrigin::SyncBase {
                        interval: iid,
                        syncbase,
                        condition: idx,
                    },
                )?;
                self.reevaluate_element(owner, 0)?;
            }
        }
        Ok(())
    }

    /// Listen for generic events from `source`.
    pub fn add_event_condition(
        &mut self,
        owner: ElementId,
        is_begin: bool,
        source: ElementId,
        offset_ms: i64,
    ) -> Result<(), TimingError> {
        self.add_event_repeat(owner, is_begin, source, None, offset_ms)
    }

    /// Listen for repeat notifications from `source`, firing only when the
    /// notification's iteration matches `repeat`.
    pub fn add_repeat_condition(
        &mut self,
        owner: ElementId,
        is_begin: bool,
        source: ElementId,
        repeat: u32,
        offset_ms: i64,
    ) -> Result<(), TimingError> {
        self.add_event_repeat(owner, is_begin, source, Some(repeat), offset_ms)
    }

    fn add_event_repeat(
        &mut self,
        owner: ElementId,
        is_begin: bool,
        source: ElementId,
        repeat: Option<u32>,
        offset_ms: i64,
    ) -> Result<(), TimingError> {
        self.el(source)?;
        let el = self.el_mut(owner)?;
        el.conditions.push(Condition {
            is_begin,
            kind: ConditionKind::EventRepeat {
                source,
                repeat,
                offset: offset_ms,
            },
        });
        Ok(())
    }

    /// One-time binding of animation targets against a resolver.
    /// Unresolvable animations are disabled rather than left to fail while
    /// sampling.
    pub fn prebind(&mut self, resolver: &mut dyn TargetResolver) {
        for el in self.elements.iter_mut() {
            if let Some(anim) = el.anim.as_mut() {
                match resolver.resolve(&anim.target) {
                    Some(handle) => anim.handle = Some(handle),
                    None => {
                        warn!("target '{}' not animatable; disabling", anim.target);
                        anim.enabled = false;
                    }
                }
            }
        }
    }

    // ---- queries ------------------------------------------------------

    pub fn element_state(&self, id: ElementId) -> Result<ElementState, TimingError> {
        Ok(self.el(id)?.state())
    }

    pub fn is_active(&self, id: ElementId) -> Result<bool, TimingError> {
        Ok(self.el(id)?.is_active())
    }

    pub fn is_frozen(&self, id: ElementId) -> Result<bool, TimingError> {
        Ok(self.el(id)?.is_frozen())
    }

    pub fn simple_time(&self, id: ElementId) -> Result<i64, TimingError> {
        Ok(self.el(id)?.simple_time())
    }

    pub fn iteration(&self, id: ElementId) -> Result<u32, TimingError> {
        Ok(self.el(id)?.iteration())
    }

    /// The element's live interval boundaries, if one is resolved.
    pub fn current_interval(
        &self,
        id: ElementId,
    ) -> Result<Option<(TimeValue, TimeValue)>, TimingError> {
        let el = self.el(id)?;
        Ok(el
            .current_interval
            .and_then(|iid| self.iv(iid))
            .map(|iv| (iv.begin(), iv.end())))
    }

    /// Candidate begin/end instance times of an element (tests, tooling).
    pub fn instance_times(&self, id: ElementId, begin: bool) -> Result<Vec<TimeValue>, TimingError> {
        let el = self.el(id)?;
        let list = if begin {
            &el.begin_instances
        } else {
            &el.end_instances
        };
        Ok(list.iter().map(|i| i.time).collect())
    }

    // ---- wall clock ---------------------------------------------------

    /// Record the monotonic wall-clock "now". Once the root interval has
    /// begun, local times map to wall clock by simple addition.
    pub fn note_wall_clock(&mut self, now_ms: i64) {
        self.pending_wall_clock = Some(now_ms);
        let root = &self.elements[self.root.0 as usize];
        if root.is_active() {
            let begin = root
                .current_interval
                .and_then(|iid| self.iv(iid))
                .map(|iv| iv.begin_ms());
            if let Some(b) = begin {
                self.begin_wall_clock = Some(now_ms - b);
            }
        }
    }

    pub fn to_wall_clock(&self, local_ms: i64) -> Option<i64> {
        self.begin_wall_clock.map(|b| b + local_ms)
    }

    // ---- entry points -------------------------------------------------

    /// Drive one clock tick through the document.
    pub fn sample(&mut self, time_ms: i64) -> Result<&Outputs, TimingError> {
        self.outputs.clear();
        self.sample_element(self.root, time_ms, 0)?;
        self.last_sample = TimeValue::Resolved(time_ms);
        Ok(&self.outputs)
    }

    /// Jump to a target time. Requires a resolved target; a backward seek
    /// unwinds the document first. The seeking flag is scoped to this one
    /// call and cleared even when sampling fails.
    pub fn seek_to(&mut self, target: TimeValue) -> Result<&Outputs, TimingError> {
        let t = target.resolved().ok_or(TimingError::SeekUnresolved)?;
        self.outputs.clear();
        self.seeking = true;
        self.seeking_back = !target.greater_than_or_equal(self.last_sample);
        let backward = self.seeking_back;
        debug!("seek to {t}ms (backward={backward})");
        let result = if backward {
            self.reset_element(self.root, 0)
                .and_then(|_| self.sample_element(self.root, t, 0))
        } else {
            self.sample_element(self.root, t, 0)
        };
        self.seeking = false;
        self.seeking_back = false;
        result?;
        self.outputs.push_event(TimingEvent::Seeked {
            time: t,
            backward,
        });
        self.last_sample = TimeValue::Resolved(t);
        Ok(&self.outputs)
    }

    /// Rebuild the document to its pre-first-interval state and resolve
    /// initial intervals from the surviving (offset) instance times.
    pub fn initialize(&mut self) -> Result<(), TimingError> {
        self.initialize_element(self.root, 0)
    }

    /// Discard the element's intervals, clear its non-offset instance
    /// times, and cascade the reset through its subtree.
    pub fn reset(&mut self, id: ElementId) -> Result<(), TimingError> {
        self.el(id)?;
        self.reset_element(id, 0)
    }

    /// Deliver a generic named event from `source` at a container-local
    /// time, feeding every matching event condition.
    pub fn deliver_event(&mut self, source: ElementId, time_ms: i64) -> Result<(), TimingError> {
        self.el(source)?;
        self.deliver_matching(source, None, time_ms, 0)
    }

    /// Deliver a repeat notification carrying its iteration number.
    pub fn deliver_repeat_event(
        &mut self,
        source: ElementId,
        iteration: u32,
        time_ms: i64,
    ) -> Result<(), TimingError> {
        self.el(source)?;
        self.deliver_matching(source, Some(iteration), time_ms, 0)
    }

    // ---- instance list maintenance ------------------------------------

    fn insert_instance(
        &mut self,
        owner: ElementId,
        is_begin: bool,
        time: TimeValue,
        origin: InstanceOrigin,
    ) -> Result<InstanceId, TimingError> {
        let id = self.ids.alloc_instance();
        let el = self.el_mut(owner)?;
        let list = if is_begin {
            &mut el.begin_instances
        } else {
            &mut el.end_instances
        };
        list.push(InstanceTime { id, time, origin });
        sort_instances(list);
        if let InstanceOrigin::SyncBase { interval, .. } = origin {
            if let Some(iv) = self.iv_mut(interval) {
                iv.add_dependent(owner, id, is_begin);
            }
        }
        Ok(id)
    }

    /// Detach one instance time from its owner, deregistering it from its
    /// source interval's dependent set when it has one.
    fn remove_instance(&mut self, owner: ElementId, instance: InstanceId) {
        let Ok(el) = self.el_mut(owner) else { return };
        let mut origin = None;
        for list in [&mut el.begin_instances, &mut el.end_instances] {
            if let Some(pos) = list.iter().position(|i| i.id == instance) {
                origin = Some(list.remove(pos).origin);
                break;
            }
        }
        if let Some(InstanceOrigin::SyncBase { interval, .. }) = origin {
            if let Some(iv) = self.iv_mut(interval) {
                iv.remove_dependent(owner, instance);
            }
        }
    }

    /// The instance currently produced by a sync-base condition, if any.
    fn condition_instance(&self, owner: ElementId, condition: usize) -> Option<InstanceId> {
        let el = self.elements.get(owner.0 as usize)?;
        el.begin_instances
            .iter()
            .chain(el.end_instances.iter())
            .find(|i| {
                matches!(
                    i.origin,
                    InstanceOrigin::SyncBase { condition: c, .. } if c == condition
                )
            })
            .map(|i| i.id)
    }

    fn update_instance_time(&mut self, owner: ElementId, instance: InstanceId, time: TimeValue) {
        let Ok(el) = self.el_mut(owner) else { return };
        for list in [&mut el.begin_instances, &mut el.end_instances] {
            if let Some(i) = list.iter_mut().find(|i| i.id == instance) {
                i.time = time;
                sort_instances(list);
                return;
            }
        }
    }

    // ---- interval resolution ------------------------------------------

    /// The earliest permissible begin for the next interval.
    fn begin_floor(&self, el: &TimedElement) -> TimeValue {
        if !el.has_run {
            return TimeValue::Resolved(0);
        }
        el.prev_interval
            .and_then(|p| self.iv(p))
            .map(|iv| iv.end())
            .filter(|e| e.is_resolved())
            .unwrap_or(TimeValue::Resolved(0))
    }

    /// First begin instance at or after the floor, with the zero-gap rule:
    /// "≥" chaining is legal, but a zero-length interval exactly at the
    /// floor of an element that already ran would loop forever, so it is
    /// skipped.
    fn select_begin(&self, el: &TimedElement, floor: TimeValue) -> Option<(i64, TimeValue)> {
        for inst in &el.begin_instances {
            let Some(b) = inst.time.resolved() else { continue };
            if TimeValue::Resolved(b) < floor {
                continue;
            }
            let end = self.compute_interval_end(el, b);
            if el.has_run && floor.resolved() == Some(b) && end <= TimeValue::Resolved(b) {
                continue;
            }
            return Some((b, end));
        }
        None
    }

    /// Earliest resolved end instance strictly after the begin, bounded by
    /// the intrinsic active duration; indefinite until something firms up.
    fn compute_interval_end(&self, el: &TimedElement, begin_ms: i64) -> TimeValue {
        let explicit = el
            .end_instances
            .iter()
            .filter_map(|i| i.time.resolved())
            .find(|v| *v > begin_ms)
            .map(TimeValue::Resolved)
            .unwrap_or(TimeValue::Indefinite);
        let intrinsic = match el.intrinsic_active_dur() {
            TimeValue::Resolved(d) => TimeValue::Resolved(begin_ms.saturating_add(d)),
            _ => TimeValue::Indefinite,
        };
        explicit.min(intrinsic)
    }

    /// Resolve the next activation window for an element that has none.
    /// Returns whether an interval was created.
    fn try_create_interval(&mut self, id: ElementId, depth: usize) -> Result<bool, TimingError> {
        self.check_depth(depth)?;
        let el = self.el(id)?;
        if el.current_interval.is_some() {
            return Ok(false);
        }
        if el.restart == Restart::Never && el.has_run {
            return Ok(false);
        }
        let floor = self.begin_floor(el);
        let Some((begin, end)) = self.select_begin(el, floor) else {
            return Ok(false);
        };
        let iid = self.ids.alloc_interval();
        self.intervals
            .push(Some(Interval::new(id, TimeValue::Resolved(begin), end)?));
        let el = self.el_mut(id)?;
        el.current_interval = Some(iid);
        if el.state == ElementState::PostActive {
            el.state = ElementState::Waiting;
        }
        debug!(
            "element {} resolved interval [{begin}, {end:?})",
            self.elements[id.0 as usize].name
        );
        self.dispatch_on_new_interval(id, iid, depth)?;
        Ok(true)
    }

    /// Notify sync dependents of the new interval, prune the superseded
    /// one, and (for containers) restart every child's timeline.
    fn dispatch_on_new_interval(
        &mut self,
        id: ElementId,
        iid: IntervalId,
        depth: usize,
    ) -> Result<(), TimingError> {
        self.check_depth(depth)?;
        if let Some((begin, end)) = self.iv(iid).map(|iv| (iv.begin_ms(), iv.end())) {
            self.outputs.push_event(TimingEvent::IntervalResolved {
                element: id,
                begin,
                end,
            });
        }
        self.retarget_sync_dependents(id, iid, depth)?;
        if let Some(prev) = self.el(id)?.prev_interval {
            self.prune_interval(prev, depth + 1)?;
            self.el_mut(id)?.prev_interval = None;
        }
        if self.el(id)?.is_container() {
            let children = self.el(id)?.children.clone();
            for child in children {
                self.initialize_element(child, depth + 1)?;
            }
        }
        Ok(())
    }

    /// Point every sync-base condition that references `source` at its new
    /// most recent interval, replacing the instance time it produced from
    /// the old one.
    fn retarget_sync_dependents(
        &mut self,
        source: ElementId,
        iid: IntervalId,
        depth: usize,
    ) -> Result<(), TimingError> {
        let mut deps: Vec<(ElementId, usize, bool, i64)> = Vec::new();
        for el in &self.elements {
            for (idx, cond) in el.conditions.iter().enumerate() {
                if let ConditionKind::SyncBase { syncbase, offset } = cond.kind {
                    if syncbase == source {
                        deps.push((el.id, idx, cond.is_begin, offset));
                    }
                }
            }
        }
        for (owner, idx, is_begin, offset) in deps {
            if let Some(old) = self.condition_instance(owner, idx) {
                self.remove_instance(owner, old);
            }
            let Some(iv) = self.iv(iid) else { continue };
            let boundary = if is_begin { iv.begin() } else { iv.end() };
            self.insert_instance(
                owner,
                is_begin,
                boundary.offset_by(offset),
                InstanceOrigin::SyncBase {
                    interval: iid,
                    syncbase: source,
                    condition: idx,
                },
            )?;
            self.reevaluate_element(owner, depth + 1)?;
        }
        Ok(())
    }

    /// Change an interval's begin and synchronously recompute every
    /// begin-dependent instance time.
    fn set_interval_begin(
        &mut self,
        iid: IntervalId,
        begin: TimeValue,
        depth: usize,
    ) -> Result<(), TimingError> {
        self.check_depth(depth)?;
        let Some(iv) = self.iv_mut(iid) else { return Ok(()) };
        if iv.begin().is_same_time(begin) {
            return Ok(());
        }
        iv.set_begin(begin)?;
        trace!("interval {iid:?} begin -> {begin:?}");
        let deps = self.iv(iid).map(|iv| iv.begin_dependents().to_vec());
        if let Some(deps) = deps {
            self.notify_dependents(iid, deps, true, depth)?;
        }
        Ok(())
    }

    /// Change an interval's end (indefinite allowed) and recompute every
    /// end-dependent instance time.
    fn set_interval_end(
        &mut self,
        iid: IntervalId,
        end: TimeValue,
        depth: usize,
    ) -> Result<(), TimingError> {
        self.check_depth(depth)?;
        let Some(iv) = self.iv_mut(iid) else { return Ok(()) };
        if iv.end().is_same_time(end) {
            return Ok(());
        }
        iv.set_end(end);
        trace!("interval {iid:?} end -> {end:?}");
        let deps = self.iv(iid).map(|iv| iv.end_dependents().to_vec());
        if let Some(deps) = deps {
            self.notify_dependents(iid, deps, false, depth)?;
        }
        Ok(())
    }

    fn notify_dependents(
        &mut self,
        iid: IntervalId,
        deps: Vec<(ElementId, InstanceId)>,
        on_begin: bool,
        depth: usize,
    ) -> Result<(), TimingError> {
        for (owner, instance) in deps {
            let Some(iv) = self.iv(iid) else { break };
            let boundary = if on_begin { iv.begin() } else { iv.end() };
            // Find the producing condition's offset through the instance.
            let offset = self
                .el(owner)?
                .begin_instances
                .iter()
                .chain(self.el(owner)?.end_instances.iter())
                .find(|i| i.id == instance)
                .and_then(|i| match i.origin {
                    InstanceOrigin::SyncBase { condition, .. } => self
                        .el(owner)
                        .ok()
                        .and_then(|el| el.conditions.get(condition))
                        .map(|c| c.offset()),
                    _ => None,
                });
            let Some(offset) = offset else { continue };
            self.update_instance_time(owner, instance, boundary.offset_by(offset));
            self.reevaluate_element(owner, depth + 1)?;
        }
        Ok(())
    }

    /// Destroy an interval, detaching every dependent instance time from
    /// its owning element (end-dependents first, each set in reverse).
    fn prune_interval(&mut self, iid: IntervalId, depth: usize) -> Result<(), TimingError> {
        self.check_depth(depth)?;
        let Some(mut interval) = self
            .intervals
            .get_mut(iid.0 as usize)
            .and_then(Option::take)
        else {
            return Ok(());
        };
        let owner = interval.owner;
        trace!("pruning interval {iid:?} of element {owner:?}");
        self.outputs
            .push_event(TimingEvent::IntervalPruned { element: owner });
        if let Ok(el) = self.el_mut(owner) {
            if el.current_interval == Some(iid) {
                el.current_interval = None;
            }
            if el.prev_interval == Some(iid) {
                el.prev_interval = None;
            }
        }
        for (dep_owner, instance) in interval.take_dependents_reversed() {
            self.remove_instance(dep_owner, instance);
            self.reevaluate_element(dep_owner, depth + 1)?;
        }
        Ok(())
    }

    /// React to a change in an element's instance lists: firm up or shift
    /// the live interval, discard it when its begin evaporated, or resolve
    /// a fresh one when policy allows.
    fn reevaluate_element(&mut self, id: ElementId, depth: usize) -> Result<(), TimingError> {
        self.check_depth(depth)?;
        let el = self.el(id)?;
        match el.state {
            ElementState::Active => {
                let Some(iid) = el.current_interval else { return Ok(()) };
                let Some(iv) = self.iv(iid) else { return Ok(()) };
                let begin = iv.begin_ms();
                let new_end = self.compute_interval_end(el, begin);
                if !iv.end().is_same_time(new_end) {
                    self.set_interval_end(iid, new_end, depth + 1)?;
                }
                // A firmed-up end in the past ends the element now.
                let el = self.el(id)?;
                if let (Some(t), Some(e)) = (
                    el.last_local,
                    self.iv(iid).map(|iv| iv.end()).and_then(|e| e.resolved()),
                ) {
                    if t >= e {
                        self.finish_interval(id, depth + 1)?;
                    }
                }
                Ok(())
            }
            ElementState::Waiting => {
                let el = self.el(id)?;
                if let Some(iid) = el.current_interval {
                    let floor = self.begin_floor(el);
                    match self.select_begin(el, floor) {
                        None => {
                            // No valid begin remains for the upcoming window.
                            self.prune_interval(iid, depth + 1)?;
                            Ok(())
                        }
                        Some((begin, end)) => {
                            self.set_interval_begin(iid, TimeValue::Resolved(begin), depth + 1)?;
                            self.set_interval_end(iid, end, depth + 1)?;
                            Ok(())
                        }
                    }
                } else {
                    self.try_create_interval(id, depth + 1).map(|_| ())
                }
            }
            ElementState::PostActive => {
                if self.el(id)?.restart != Restart::Never {
                    self.try_create_interval(id, depth + 1)?;
                }
                Ok(())
            }
        }
    }

    /// Transition Active -> PostActive, keeping the ended interval as the
    /// most recent one for dependents and the next begin floor.
    fn finish_interval(&mut self, id: ElementId, depth: usize) -> Result<(), TimingError> {
        self.check_depth(depth)?;
        let el = self.el(id)?;
        let Some(iid) = el.current_interval else { return Ok(()) };
        let end = self
            .iv(iid)
            .map(|iv| iv.end().resolved().unwrap_or(el.simple_time))
            .unwrap_or(0);
        if let Some(stale) = el.prev_interval {
            self.prune_interval(stale, depth + 1)?;
        }
        let el = self.el_mut(id)?;
        el.prev_interval = Some(iid);
        el.current_interval = None;
        el.state = ElementState::PostActive;
        debug!("element {} ended at {end}ms", el.name);
        self.outputs
            .push_event(TimingEvent::IntervalEnded { element: id, time: end });
        Ok(())
    }

    // ---- sampling -----------------------------------------------------

    /// Sample one element at its container's simple time, cascading to
    /// children in document order when it is an active container.
    fn sample_element(&mut self, id: ElementId, t: i64, depth: usize) -> Result<(), TimingError> {
        self.check_depth(depth)?;
        self.el_mut(id)?.last_local = Some(t);

        if self.el(id)?.state == ElementState::Waiting
            && self.el(id)?.current_interval.is_none()
        {
            self.try_create_interval(id, depth)?;
        }

        // restart="always": a begin instance inside the active window
        // truncates the current interval at that begin.
        let el = self.el(id)?;
        if el.state == ElementState::Active && el.restart == Restart::Always {
            if let Some(iid) = el.current_interval {
                if let Some(iv) = self.iv(iid) {
                    let begin = iv.begin_ms();
                    let end = iv.end();
                    let restart_at = el
                        .begin_instances
                        .iter()
                        .filter_map(|i| i.time.resolved())
                        .find(|b| *b > begin && *b <= t);
                    if let Some(b) = restart_at {
                        if TimeValue::Resolved(b) < end {
                            debug!("element {} restarting at {b}ms", el.name);
                            self.set_interval_end(iid, TimeValue::Resolved(b), depth + 1)?;
                        }
                    }
                }
            }
        }

        // State transitions, chaining through zero-gap intervals.
        let mut transitions = 0usize;
        loop {
            transitions += 1;
            if transitions > MAX_TRANSITIONS_PER_SAMPLE {
                return Err(TimingError::PropagationDepthExceeded { depth: transitions });
            }
            let el = self.el(id)?;
            match el.state {
                ElementState::Waiting => {
                    let Some(iid) = el.current_interval else { break };
                    let Some(iv) = self.iv(iid) else { break };
                    if iv.begin_ms() > t {
                        break; // upcoming
                    }
                    let begin = iv.begin_ms();
                    let el = self.el_mut(id)?;
                    el.state = ElementState::Active;
                    el.has_run = true;
                    el.iteration = 0;
                    el.simple_time = 0;
                    debug!("element {} began at {begin}ms", el.name);
                    self.outputs
                        .push_event(TimingEvent::IntervalBegan { element: id, begin });
                    if id == self.root {
                        if let Some(now) = self.pending_wall_clock {
                            self.begin_wall_clock = Some(now - begin);
                        }
                    }
                    // Fall through to the Active arm to catch an end <= t.
                }
                ElementState::Active => {
                    let Some(iid) = el.current_interval else { break };
                    let ended = self
                        .iv(iid)
                        .and_then(|iv| iv.end().resolved())
                        .map(|e| t >= e)
                        .unwrap_or(false);
                    if !ended {
                        break;
                    }
                    self.finish_interval(id, depth)?;
                    if self.el(id)?.restart != Restart::Never
                        && self.try_create_interval(id, depth)?
                    {
                        continue; // the next interval may begin this tick
                    }
                    break;
                }
                ElementState::PostActive => break,
            }
        }

        if self.el(id)?.state != ElementState::Active {
            return Ok(());
        }

        self.update_repeat(id, t, depth)?;

        if self.el(id)?.is_container() {
            let st = self.el(id)?.simple_time;
            let children = self.el(id)?.children.clone();
            for child in children {
                self.sample_element(child, st, depth + 1)?;
            }
        } else {
            self.emit_animation_value(id)?;
        }
        Ok(())
    }

    /// Track the current iteration and simple time, driving repeat
    /// notifications and the container end-and-reinitialize cascade at
    /// every iteration boundary crossed this tick.
    fn update_repeat(&mut self, id: ElementId, t: i64, depth: usize) -> Result<(), TimingError> {
        let el = self.el(id)?;
        let Some(iid) = el.current_interval else { return Ok(()) };
        let Some(iv) = self.iv(iid) else { return Ok(()) };
        let local = t - iv.begin_ms();
        let begin = iv.begin_ms();

        match el.simple_dur {
            TimeValue::Resolved(d) if d > 0 => {
                let new_iter = (local / d) as u32;
                let st = local % d;
                let prev_iter = el.iteration;
                if new_iter > prev_iter {
                    for k in (prev_iter + 1)..=new_iter {
                        self.outputs.push_event(TimingEvent::Repeat {
                            element: id,
                            iteration: k,
                        });
                        trace!("element {id:?} starting repeat {k}");
                        if !self.seeking {
                            // Repeat notifications feed event-repeat
                            // conditions in the same timeline.
                            self.deliver_matching(
                                id,
                                Some(k),
                                begin + (k as i64) * d,
                                depth + 1,
                            )?;
                        }
                        if self.el(id)?.is_container() {
                            self.end_children_at(id, d, depth)?;
                            let children = self.el(id)?.children.clone();
                            for child in children {
                                self.initialize_element(child, depth + 1)?;
                            }
                        }
                    }
                }
                let el = self.el_mut(id)?;
                el.iteration = new_iter;
                el.simple_time = st;
            }
            _ => {
                let el = self.el_mut(id)?;
                el.iteration = 0;
                el.simple_time = local;
            }
        }
        Ok(())
    }

    /// End every child at a container-local time, in two passes: all ends
    /// are queued before any child samples, so no child observes a sibling
    /// mid-transition.
    fn end_children_at(
        &mut self,
        id: ElementId,
        time: i64,
        depth: usize,
    ) -> Result<(), TimingError> {
        self.check_depth(depth)?;
        self.el_mut(id)?.simple_time = time;
        let children = self.el(id)?.children.clone();
        for child in &children {
            let Some(iid) = self.el(*child)?.current_interval else { continue };
            let Some(iv) = self.iv(iid) else { continue };
            if iv.begin_ms() <= time && iv.end() > TimeValue::Resolved(time) {
                self.set_interval_end(iid, TimeValue::Resolved(time), depth + 1)?;
            }
        }
        for child in children {
            self.sample_element(child, time, depth + 1)?;
        }
        Ok(())
    }

    /// Reset to pre-first-interval state, then resolve a fresh interval
    /// from the surviving instance times. When a container's new interval
    /// is dispatched its children are re-initialized there; a container
    /// left without an interval cascades the initialize itself.
    fn initialize_element(&mut self, id: ElementId, depth: usize) -> Result<(), TimingError> {
        self.check_depth(depth)?;
        self.reset_element(id, depth)?;
        let created = self.try_create_interval(id, depth + 1)?;
        if !created && self.el(id)?.is_container() {
            let children = self.el(id)?.children.clone();
            for child in children {
                self.initialize_element(child, depth + 1)?;
            }
        }
        Ok(())
    }

    fn reset_element(&mut self, id: ElementId, depth: usize) -> Result<(), TimingError> {
        self.check_depth(depth)?;
        trace!("reset element {id:?}");
        let el = self.el(id)?;
        let current = el.current_interval;
        let prev = el.prev_interval;
        if let Some(iid) = current {
            self.prune_interval(iid, depth + 1)?;
        }
        if let Some(iid) = prev {
            self.prune_interval(iid, depth + 1)?;
        }
        // Clear event- and sync-derived instance times; offsets survive.
        let el = self.el(id)?;
        let doomed: Vec<InstanceId> = el
            .begin_instances
            .iter()
            .chain(el.end_instances.iter())
            .filter(|i| !i.survives_reset())
            .map(|i| i.id)
            .collect();
        for inst in doomed.into_iter().rev() {
            self.remove_instance(id, inst);
        }
        let el = self.el_mut(id)?;
        el.state = ElementState::Waiting;
        el.current_interval = None;
        el.prev_interval = None;
        el.iteration = 0;
        el.simple_time = 0;
        el.has_run = false;
        el.last_local = None;
        // Sync-base conditions re-derive their instance time from the
        // source's most recent interval; event-derived times stay gone.
        let conds: Vec<(usize, bool, ElementId, i64)> = self
            .el(id)?
            .conditions
            .iter()
            .enumerate()
            .filter_map(|(idx, c)| match c.kind {
                ConditionKind::SyncBase { syncbase, offset } => {
                    Some((idx, c.is_begin, syncbase, offset))
                }
                _ => None,
            })
            .collect();
        for (idx, is_begin, syncbase, offset) in conds {
            let Ok(source) = self.el(syncbase) else { continue };
            let Some(iid) = source.current_interval.or(source.prev_interval) else {
                continue;
            };
            let Some(boundary) = self
                .iv(iid)
                .map(|iv| if is_begin { iv.begin() } else { iv.end() })
            else {
                continue;
            };
            self.insert_instance(
                id,
                is_begin,
                boundary.offset_by(offset),
                InstanceOrigin::SyncBase {
                    interval: iid,
                    syncbase,
                    condition: idx,
                },
            )?;
        }
        let children = self.el(id)?.children.clone();
        for child in children {
            self.reset_element(child, depth + 1)?;
        }
        Ok(())
    }

    /// Feed every event/repeat condition that matches a delivery.
    fn deliver_matching(
        &mut self,
        source: ElementId,
        iteration: Option<u32>,
        time_ms: i64,
        depth: usize,
    ) -> Result<(), TimingError> {
        self.check_depth(depth)?;
        let mut matches: Vec<(ElementId, bool, i64)> = Vec::new();
        for el in &self.elements {
            for cond in &el.conditions {
                if let ConditionKind::EventRepeat {
                    source: s,
                    repeat,
                    offset,
                } = cond.kind
                {
                    if s != source {
                        continue;
                    }
                    let qualifies = match (iteration, repeat) {
                        (None, None) => true,
                        (Some(i), Some(n)) => i == n,
                        _ => false,
                    };
                    if qualifies {
                        matches.push((el.id, cond.is_begin, offset));
                    }
                }
            }
        }
        for (owner, is_begin, offset) in matches {
            self.insert_instance(
                owner,
                is_begin,
                TimeValue::Resolved(time_ms.saturating_add(offset)),
                InstanceOrigin::Event,
            )?;
            self.reevaluate_element(owner, depth + 1)?;
        }
        Ok(())
    }

    /// Compute the active animation value into the scratch buffer and
    /// publish it as a change.
    fn emit_animation_value(&mut self, id: ElementId) -> Result<(), TimingError> {
        let mut scratch = std::mem::take(&mut self.scratch);
        let el = &self.elements[id.0 as usize];
        let result = match el.anim.as_ref() {
            Some(anim) if anim.enabled => anim
                .compute(el.simple_time, el.simple_dur, el.iteration, &mut scratch)
                .map(|_| {
                    Some(Change {
                        element: id,
                        key: anim.output_key().to_string(),
                        value: scratch.clone(),
                    })
                }),
            _ => Ok(None),
        };
        self.scratch = scratch;
        if let Some(change) = result? {
            self.outputs.push_change(change);
        }
        Ok(())
    }
}
