//! Error types for the animation engine.

use thiserror::Error;

/// Errors surfaced by the animation engine.
///
/// The numeric core itself is infallible: unknown spring ids resolve to
/// `None`/`false` at lookup sites and degenerate float math follows IEEE-754.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum AnimationError {
    #[error("a spring config named {0:?} is already registered")]
    ConfigNameTaken(String),
}
