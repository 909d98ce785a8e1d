//! Listener traits for spring and system events.
//!
//! Every method has a no-op default, so observers implement only the
//! callbacks they care about. Listeners run on the single thread that drives
//! the system, so no `Send`/`Sync` bounds are required and `Rc`-backed
//! observers are fine.

use crate::spring::Spring;
use crate::system::SpringSystem;

/// Handle returned at listener registration, used for removal.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct ListenerId(pub(crate) u64);

/// Observer of one spring's motion.
///
/// Within a single integration call the order is always activate, then
/// update, then at-rest, and each registered listener receives its full
/// sequence before the next listener is visited.
pub trait SpringListener {
    /// The spring left its resting state and will start integrating.
    fn on_spring_activate(&mut self, _spring: &Spring) {}

    /// The spring's current value changed.
    fn on_spring_update(&mut self, _spring: &Spring) {}

    /// The spring reached its rest thresholds and was pinned to its target.
    fn on_spring_at_rest(&mut self, _spring: &Spring) {}

    /// The spring was given a new target value.
    fn on_spring_end_state_change(&mut self, _spring: &Spring) {}
}

/// Observer of a whole system's integration passes.
///
/// The system is passed mutably so that a post-integration listener can
/// chain follow-up animations (e.g. retarget another spring once the first
/// one lands).
pub trait SpringSystemListener {
    /// Called at the top of every loop pass, before springs advance.
    fn on_before_integrate(&mut self, _system: &mut SpringSystem) {}

    /// Called at the end of every loop pass, after idle bookkeeping.
    fn on_after_integrate(&mut self, _system: &mut SpringSystem) {}
}
