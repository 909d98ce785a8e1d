//! Coil Animation Engine
//!
//! Damped-spring physics for driving UI property animations (translation,
//! scale, rotation) from a spring's current value.
//!
//! # Features
//!
//! - **Spring Physics**: fixed-timestep RK4 integration of the damped-spring
//!   ODE, with fractional-step interpolation and rest detection
//! - **Scheduling**: a [`SpringSystem`] registry that advances only the
//!   springs that still need integration and goes idle when none do
//! - **Observers**: per-spring and per-system listener traits notified in
//!   registration order
//! - **Injected tick source**: frame scheduling and time reads go through the
//!   [`SpringClock`] and [`SpringLooper`] traits, so the engine runs the same
//!   under a display-refresh callback, a test harness, or a headless driver
//!
//! # Example
//!
//! ```rust
//! use coil_animation::{ManualClock, SpringSystem, SteppingLooper};
//!
//! let clock = ManualClock::new();
//! let mut system = SpringSystem::new(clock.clone(), SteppingLooper::new());
//!
//! let id = system.create_spring();
//! system.set_end_value(id, 1.0);
//! assert!(!system.is_idle());
//!
//! // Drive the loop the way a frame callback would.
//! while !system.is_idle() {
//!     clock.advance(16.0);
//!     system.loop_once();
//! }
//!
//! let spring = system.spring(id).unwrap();
//! assert_eq!(spring.current_value(), 1.0);
//! ```

pub mod config;
pub mod error;
pub mod listener;
pub mod looper;
pub mod math;
pub mod registry;
pub mod spring;
pub mod system;

pub use config::{BouncyConversion, SpringConfig};
pub use error::AnimationError;
pub use listener::{ListenerId, SpringListener, SpringSystemListener};
pub use looper::{
    CallbackLooper, ManualClock, SpringClock, SpringLooper, SteppingLooper, SystemClock, TickHandle,
};
pub use math::{clamp, map_value_in_range};
pub use registry::SpringConfigRegistry;
pub use spring::{PhysicsState, Spring, SpringId};
pub use system::SpringSystem;

pub(crate) type FxIndexMap<K, V> = indexmap::IndexMap<K, V, rustc_hash::FxBuildHasher>;
pub(crate) type FxIndexSet<T> = indexmap::IndexSet<T, rustc_hash::FxBuildHasher>;
