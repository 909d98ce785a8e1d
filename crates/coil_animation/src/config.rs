//! Spring configuration
//!
//! Tension/friction pairs plus conversions from the two design-tool scales
//! (the Origami tension/friction scale and the bouncy-patch
//! bounciness/speed scale) into raw physical constants.

/// Physical constants of one spring.
///
/// `tension` is the Hooke's-law restoring coefficient and `friction` the
/// linear damping coefficient of the ODE `v' = tension * (target - x) -
/// friction * v`. Both are expected to be positive; this is not enforced, and
/// non-positive values produce numerically defined but non-converging motion.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct SpringConfig {
    pub tension: f64,
    pub friction: f64,
}

impl SpringConfig {
    /// Create a config from raw tension and friction.
    pub fn new(tension: f64, friction: f64) -> Self {
        Self { tension, friction }
    }

    /// Create a config from values on the Origami tension/friction scale
    /// (roughly 0..100).
    pub fn from_origami_tension_and_friction(tension: f64, friction: f64) -> Self {
        Self::new(
            tension_from_origami_value(tension),
            friction_from_origami_value(friction),
        )
    }

    /// Create a config from a bounciness/speed pair.
    pub fn from_bounciness_and_speed(bounciness: f64, speed: f64) -> Self {
        let conversion = BouncyConversion::new(speed, bounciness);
        Self::from_origami_tension_and_friction(
            conversion.bouncy_tension(),
            conversion.bouncy_friction(),
        )
    }
}

impl Default for SpringConfig {
    /// The stock config, tool values (40, 7). `Copy` semantics mean every
    /// assignment is an independent value; reconfiguring one spring never
    /// affects another.
    fn default() -> Self {
        Self::from_origami_tension_and_friction(40.0, 7.0)
    }
}

/// Convert an Origami tension value to a raw tension.
pub fn tension_from_origami_value(value: f64) -> f64 {
    (value - 30.0) * 3.62 + 194.0
}

/// Invert [`tension_from_origami_value`].
pub fn origami_value_from_tension(tension: f64) -> f64 {
    (tension - 194.0) / 3.62 + 30.0
}

/// Convert an Origami friction value to a raw friction.
pub fn friction_from_origami_value(value: f64) -> f64 {
    (value - 8.0) * 3.0 + 25.0
}

/// Invert [`friction_from_origami_value`].
pub fn origami_value_from_friction(friction: f64) -> f64 {
    (friction - 25.0) / 3.0 + 8.0
}

/// Conversion from the bouncy-patch bounciness/speed scale to Origami
/// tension and friction values.
///
/// Bounciness and speed are normalized onto 0..1, speed projects directly
/// onto a tension range, and friction is eased from the no-bounce friction
/// curve for that tension down toward near zero as bounciness rises.
#[derive(Clone, Copy, Debug)]
pub struct BouncyConversion {
    bounciness: f64,
    speed: f64,
    bouncy_tension: f64,
    bouncy_friction: f64,
}

impl BouncyConversion {
    pub fn new(speed: f64, bounciness: f64) -> Self {
        let b = normalize(bounciness / 1.7, 0.0, 20.0);
        let b = project_normal(b, 0.0, 0.8);
        let s = normalize(speed / 1.7, 0.0, 20.0);
        let bouncy_tension = project_normal(s, 0.5, 200.0);
        let bouncy_friction =
            quadratic_out_interpolation(b, b3_nobounce(bouncy_tension), 0.01);
        Self {
            bounciness,
            speed,
            bouncy_tension,
            bouncy_friction,
        }
    }

    pub fn bounciness(&self) -> f64 {
        self.bounciness
    }

    pub fn speed(&self) -> f64 {
        self.speed
    }

    pub fn bouncy_tension(&self) -> f64 {
        self.bouncy_tension
    }

    pub fn bouncy_friction(&self) -> f64 {
        self.bouncy_friction
    }
}

fn normalize(value: f64, start: f64, end: f64) -> f64 {
    (value - start) / (end - start)
}

fn project_normal(n: f64, start: f64, end: f64) -> f64 {
    start + n * (end - start)
}

fn linear_interpolation(t: f64, start: f64, end: f64) -> f64 {
    t * end + (1.0 - t) * start
}

fn quadratic_out_interpolation(t: f64, start: f64, end: f64) -> f64 {
    linear_interpolation(2.0 * t - t * t, start, end)
}

fn b3_friction1(x: f64) -> f64 {
    0.0007 * x.powi(3) - 0.031 * x.powi(2) + 0.64 * x + 1.28
}

fn b3_friction2(x: f64) -> f64 {
    0.000044 * x.powi(3) - 0.006 * x.powi(2) + 0.36 * x + 2.0
}

fn b3_friction3(x: f64) -> f64 {
    0.00000045 * x.powi(3) - 0.000332 * x.powi(2) + 0.1078 * x + 5.84
}

/// Friction producing no visible bounce at the given tension; the curve is
/// fitted piecewise over three tension bands.
fn b3_nobounce(tension: f64) -> f64 {
    if tension <= 18.0 {
        b3_friction1(tension)
    } else if tension <= 44.0 {
        b3_friction2(tension)
    } else {
        b3_friction3(tension)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_values() {
        let config = SpringConfig::default();
        assert!((config.tension - 230.2).abs() < 1e-9);
        assert!((config.friction - 22.0).abs() < 1e-9);
    }

    #[test]
    fn test_origami_conversions_invert() {
        for value in [0.0, 7.0, 40.0, 72.5, 100.0] {
            let tension = tension_from_origami_value(value);
            assert!((origami_value_from_tension(tension) - value).abs() < 1e-9);

            let friction = friction_from_origami_value(value);
            assert!((origami_value_from_friction(friction) - value).abs() < 1e-9);
        }
    }

    #[test]
    fn test_bouncy_conversion_produces_positive_constants() {
        let config = SpringConfig::from_bounciness_and_speed(10.0, 10.0);
        assert!(config.tension > 0.0);
        assert!(config.friction > 0.0);
    }

    #[test]
    fn test_more_bounciness_means_less_friction() {
        let tame = BouncyConversion::new(12.0, 5.0);
        let lively = BouncyConversion::new(12.0, 18.0);
        assert_eq!(tame.bouncy_tension(), lively.bouncy_tension());
        assert!(
            lively.bouncy_friction() < tame.bouncy_friction(),
            "expected friction to drop as bounciness rises: {} vs {}",
            lively.bouncy_friction(),
            tame.bouncy_friction()
        );
    }

    #[test]
    fn test_config_copies_are_independent() {
        let shared = SpringConfig::default();
        let mut mine = shared;
        mine.tension = 1.0;
        assert!((shared.tension - 230.2).abs() < 1e-9);
    }
}
