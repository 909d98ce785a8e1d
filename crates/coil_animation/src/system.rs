//! Spring registry and integration loop
//!
//! [`SpringSystem`] owns every spring it creates, tracks which of them still
//! need integration, and drives them from an injected clock and tick source.
//! The loop is self-terminating: it requests the next tick only while at
//! least one spring remains active, and goes idle the moment the active set
//! empties.

use smallvec::SmallVec;

use crate::config::SpringConfig;
use crate::listener::{ListenerId, SpringSystemListener};
use crate::looper::{SpringClock, SpringLooper, TickHandle};
use crate::spring::{Spring, SpringId};
use crate::{FxIndexMap, FxIndexSet};

struct ListenerEntry {
    id: ListenerId,
    listener: Box<dyn SpringSystemListener>,
}

/// Owns a set of springs and advances the active ones on a shared loop.
pub struct SpringSystem {
    springs: FxIndexMap<SpringId, Spring>,
    active_springs: FxIndexSet<SpringId>,
    listeners: Vec<ListenerEntry>,
    next_spring_id: u64,
    next_listener_id: u64,
    clock: Box<dyn SpringClock>,
    looper: Box<dyn SpringLooper>,
    pending_tick: Option<TickHandle>,
    last_time_millis: Option<f64>,
    idle: bool,
}

impl SpringSystem {
    /// One frame at 60 fps, the default step for headless driving.
    pub const SIXTY_FPS_MILLIS: f64 = 16.667;

    pub fn new(
        clock: impl SpringClock + 'static,
        looper: impl SpringLooper + 'static,
    ) -> Self {
        Self {
            springs: FxIndexMap::default(),
            active_springs: FxIndexSet::default(),
            listeners: Vec::new(),
            next_spring_id: 0,
            next_listener_id: 0,
            clock: Box::new(clock),
            looper: Box::new(looper),
            pending_tick: None,
            last_time_millis: None,
            idle: true,
        }
    }

    /// Whether the loop is currently dormant (no active springs, no tick
    /// requested by this system).
    pub fn is_idle(&self) -> bool {
        self.idle
    }

    /// Create a spring with the stock config. The system owns the spring;
    /// the returned id addresses it.
    pub fn create_spring(&mut self) -> SpringId {
        self.create_spring_with_config(SpringConfig::default())
    }

    pub fn create_spring_with_config(&mut self, config: SpringConfig) -> SpringId {
        let id = SpringId(self.next_spring_id);
        self.next_spring_id += 1;
        self.springs.insert(id, Spring::new(id, config));
        tracing::debug!(spring = id.value(), "spring created");
        id
    }

    pub fn spring(&self, id: SpringId) -> Option<&Spring> {
        self.springs.get(&id)
    }

    pub fn spring_mut(&mut self, id: SpringId) -> Option<&mut Spring> {
        self.springs.get_mut(&id)
    }

    /// Run a closure against one spring, if it exists.
    pub fn with_spring_mut<R>(
        &mut self,
        id: SpringId,
        f: impl FnOnce(&mut Spring) -> R,
    ) -> Option<R> {
        self.springs.get_mut(&id).map(f)
    }

    /// All springs in creation order.
    pub fn all_springs(&self) -> impl Iterator<Item = &Spring> {
        self.springs.values()
    }

    pub fn spring_count(&self) -> usize {
        self.springs.len()
    }

    pub fn active_spring_count(&self) -> usize {
        self.active_springs.len()
    }

    /// Retarget a spring and wake it.
    ///
    /// A no-op when the spring is already resting at that value. Otherwise
    /// the spring records its start value, joins the active set (waking the
    /// loop if it was idle), and its listeners hear the end-state change
    /// immediately, independent of the next integration pass.
    ///
    /// Returns false iff the id is not registered.
    pub fn set_end_value(&mut self, id: SpringId, end_value: f64) -> bool {
        let Some(spring) = self.springs.get_mut(&id) else {
            return false;
        };
        if spring.prepare_end_value(end_value) {
            self.activate_spring(id);
            if let Some(spring) = self.springs.get_mut(&id) {
                spring.notify_end_state_change();
            }
        }
        true
    }

    /// Add a spring to the active set and, if the system was idle, wake the
    /// loop by requesting a tick (canceling any stale pending request
    /// first). Returns false iff the id is not registered.
    pub fn activate_spring(&mut self, id: SpringId) -> bool {
        if !self.springs.contains_key(&id) {
            return false;
        }
        self.active_springs.insert(id);
        if self.idle {
            self.idle = false;
            tracing::debug!(spring = id.value(), "system waking up");
            if let Some(handle) = self.pending_tick.take() {
                self.looper.cancel_tick(handle);
            }
            self.pending_tick = Some(self.looper.request_tick());
        }
        true
    }

    /// Remove a spring from the active set and the registry. The returned
    /// spring drops its listeners with it unless the caller keeps it.
    pub fn deregister_spring(&mut self, id: SpringId) -> Option<Spring> {
        self.active_springs.shift_remove(&id);
        let spring = self.springs.shift_remove(&id);
        if spring.is_some() {
            tracing::debug!(spring = id.value(), "spring deregistered");
        }
        spring
    }

    /// Integrate every active spring by `delta_millis`, then drop the ones
    /// that no longer need advancing.
    ///
    /// Springs report one extra pass after crossing into rest so their final
    /// value is pinned exactly to the target; only then do they leave the
    /// active set. Removal is deferred to the end of the pass so the set is
    /// never mutated mid-iteration.
    pub fn advance(&mut self, time_millis: f64, delta_millis: f64) {
        let active: SmallVec<[SpringId; 8]> = self.active_springs.iter().copied().collect();
        let mut idle_ids: SmallVec<[SpringId; 8]> = SmallVec::new();

        for id in active {
            let Some(spring) = self.springs.get_mut(&id) else {
                continue;
            };
            if spring.system_should_advance() {
                spring.advance(time_millis / 1000.0, delta_millis / 1000.0);
            } else {
                idle_ids.push(id);
            }
        }

        for id in idle_ids {
            self.active_springs.shift_remove(&id);
        }
    }

    /// Run one loop pass at the injected clock's current time.
    pub fn loop_once(&mut self) {
        let now = self.clock.now_millis();
        self.loop_at(now);
    }

    /// Run one loop pass at an explicit time, for embedders that carry
    /// their own frame timestamps.
    ///
    /// The first pass after idle is given a synthetic 1 ms elapsed time so
    /// integration never sees a zero or negative delta. When the active set
    /// empties the system flips back to idle and stops requesting ticks;
    /// otherwise exactly one follow-up tick is requested.
    pub fn loop_at(&mut self, current_time_millis: f64) {
        let last = self
            .last_time_millis
            .unwrap_or(current_time_millis - 1.0);
        let elapsed_millis = current_time_millis - last;
        self.last_time_millis = Some(current_time_millis);
        tracing::trace!(
            time = current_time_millis,
            elapsed = elapsed_millis,
            active = self.active_springs.len(),
            "loop pass"
        );

        self.for_each_listener(|listener, system| listener.on_before_integrate(system));

        self.advance(current_time_millis, elapsed_millis);
        if self.active_springs.is_empty() {
            self.idle = true;
            self.last_time_millis = None;
            tracing::debug!("system going idle");
        }

        self.for_each_listener(|listener, system| listener.on_after_integrate(system));

        if let Some(handle) = self.pending_tick.take() {
            self.looper.cancel_tick(handle);
        }
        if !self.idle {
            self.pending_tick = Some(self.looper.request_tick());
        }
    }

    /// Loop synchronously until every spring rests, stepping time by
    /// `step_millis` per pass. Useful for tests and offline evaluation.
    ///
    /// A spring whose config can never satisfy the rest predicate will keep
    /// this running forever, exactly as it would keep a frame loop ticking.
    pub fn run_until_idle(&mut self, step_millis: f64) {
        let mut now = self.last_time_millis.unwrap_or(0.0);
        while !self.idle {
            now += step_millis;
            self.loop_at(now);
        }
    }

    /// Register a system listener. Listeners are notified in registration
    /// order.
    pub fn add_listener(&mut self, listener: impl SpringSystemListener + 'static) -> ListenerId {
        let id = ListenerId(self.next_listener_id);
        self.next_listener_id += 1;
        self.listeners.push(ListenerEntry {
            id,
            listener: Box::new(listener),
        });
        id
    }

    /// Remove a system listener by the id returned at registration. Returns
    /// whether it was present.
    pub fn remove_listener(&mut self, id: ListenerId) -> bool {
        let before = self.listeners.len();
        self.listeners.retain(|entry| entry.id != id);
        self.listeners.len() != before
    }

    pub fn remove_all_listeners(&mut self) {
        self.listeners.clear();
    }

    // Listeners are lifted out for the duration of the dispatch so each
    // callback can borrow the system mutably. Listeners added during a
    // callback are kept and join the rotation from the next dispatch on.
    fn for_each_listener(
        &mut self,
        mut visit: impl FnMut(&mut dyn SpringSystemListener, &mut SpringSystem),
    ) {
        let mut listeners = std::mem::take(&mut self.listeners);
        for entry in listeners.iter_mut() {
            visit(entry.listener.as_mut(), self);
        }
        let added = std::mem::replace(&mut self.listeners, listeners);
        self.listeners.extend(added);
    }
}

impl std::fmt::Debug for SpringSystem {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SpringSystem")
            .field("springs", &self.springs.len())
            .field("active_springs", &self.active_springs.len())
            .field("idle", &self.idle)
            .field("last_time_millis", &self.last_time_millis)
            .finish()
    }
}
