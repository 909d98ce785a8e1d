//! Clock and tick-source abstraction.
//!
//! The engine never schedules frames itself. It reads time through
//! [`SpringClock`] and asks the embedding platform for "run me once, soon"
//! callbacks through [`SpringLooper`], which is typically bound to a display
//! refresh. The stock implementations cover the real-time case
//! ([`SystemClock`], [`CallbackLooper`]) and deterministic driving for tests
//! and headless embedders ([`ManualClock`], [`SteppingLooper`]).

use std::cell::{Cell, RefCell};
use std::rc::Rc;
use std::time::Instant;

/// Opaque identifier for one outstanding tick request.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct TickHandle(u64);

impl TickHandle {
    pub fn new(raw: u64) -> Self {
        Self(raw)
    }

    pub fn raw(self) -> u64 {
        self.0
    }
}

/// Millisecond-resolution time source.
pub trait SpringClock {
    /// Current time in milliseconds. Ideally monotonic.
    fn now_millis(&mut self) -> f64;
}

/// Platform scheduling primitive for the integration loop.
///
/// `request_tick` schedules exactly one future callback to
/// [`SpringSystem::loop_once`](crate::SpringSystem::loop_once);
/// `cancel_tick` is best-effort and must tolerate handles that are invalid
/// or have already fired without erroring.
pub trait SpringLooper {
    fn request_tick(&mut self) -> TickHandle;

    fn cancel_tick(&mut self, handle: TickHandle);
}

/// Wall-clock time anchored at construction.
#[derive(Clone, Debug)]
pub struct SystemClock {
    origin: Instant,
}

impl SystemClock {
    pub fn new() -> Self {
        Self {
            origin: Instant::now(),
        }
    }
}

impl Default for SystemClock {
    fn default() -> Self {
        Self::new()
    }
}

impl SpringClock for SystemClock {
    fn now_millis(&mut self) -> f64 {
        self.origin.elapsed().as_secs_f64() * 1000.0
    }
}

/// Hand-advanced clock for tests and offline rendering.
///
/// Clones share the same underlying time, so keep one clone to advance while
/// the system owns another.
#[derive(Clone, Debug, Default)]
pub struct ManualClock {
    millis: Rc<Cell<f64>>,
}

impl ManualClock {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&self, millis: f64) {
        self.millis.set(millis);
    }

    pub fn advance(&self, delta_millis: f64) {
        self.millis.set(self.millis.get() + delta_millis);
    }

    pub fn now(&self) -> f64 {
        self.millis.get()
    }
}

impl SpringClock for ManualClock {
    fn now_millis(&mut self) -> f64 {
        self.millis.get()
    }
}

/// Bridges the loop to a host scheduling primitive via two closures, e.g. a
/// display-link or animation-frame API.
pub struct CallbackLooper {
    request: Box<dyn FnMut() -> TickHandle>,
    cancel: Box<dyn FnMut(TickHandle)>,
}

impl CallbackLooper {
    pub fn new(
        request: impl FnMut() -> TickHandle + 'static,
        cancel: impl FnMut(TickHandle) + 'static,
    ) -> Self {
        Self {
            request: Box::new(request),
            cancel: Box::new(cancel),
        }
    }
}

impl SpringLooper for CallbackLooper {
    fn request_tick(&mut self) -> TickHandle {
        (self.request)()
    }

    fn cancel_tick(&mut self, handle: TickHandle) {
        (self.cancel)(handle);
    }
}

#[derive(Debug, Default)]
struct SteppingState {
    next_handle: u64,
    pending: Option<TickHandle>,
    requests: u64,
    cancels: u64,
}

/// Records tick requests instead of scheduling them.
///
/// The embedder (or test) observes the pending request and drives the system
/// by calling [`SpringSystem::loop_at`](crate::SpringSystem::loop_at) or
/// [`SpringSystem::loop_once`](crate::SpringSystem::loop_once) itself.
/// Clones share state, like [`ManualClock`].
#[derive(Clone, Debug, Default)]
pub struct SteppingLooper {
    state: Rc<RefCell<SteppingState>>,
}

impl SteppingLooper {
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether a tick request is outstanding.
    pub fn tick_pending(&self) -> bool {
        self.state.borrow().pending.is_some()
    }

    /// Consume the outstanding request, if any. Returns whether one existed.
    pub fn take_tick(&self) -> bool {
        self.state.borrow_mut().pending.take().is_some()
    }

    /// Total requests seen, including canceled ones.
    pub fn tick_requests(&self) -> u64 {
        self.state.borrow().requests
    }

    /// Total requests that were canceled while still pending.
    pub fn tick_cancels(&self) -> u64 {
        self.state.borrow().cancels
    }
}

impl SpringLooper for SteppingLooper {
    fn request_tick(&mut self) -> TickHandle {
        let mut state = self.state.borrow_mut();
        state.next_handle += 1;
        let handle = TickHandle(state.next_handle);
        state.pending = Some(handle);
        state.requests += 1;
        handle
    }

    fn cancel_tick(&mut self, handle: TickHandle) {
        let mut state = self.state.borrow_mut();
        // Stale handles (already fired or replaced) are ignored.
        if state.pending == Some(handle) {
            state.pending = None;
            state.cancels += 1;
        }
    }
}
