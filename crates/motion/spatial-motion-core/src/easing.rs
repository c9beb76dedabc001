//! Easing curves for time-bounded transitions (go-to-start, return-to-initial).

use serde::{Deserialize, Serialize};

#[derive(Copy, Clone, Debug, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Easing {
    Linear,
    EaseInQuad,
    EaseOutQuad,
    #[default]
    EaseInOutCubic,
    EaseInOutSine,
}

impl Easing {
    /// Map normalized progress to eased progress. Input is clamped to [0, 1].
    #[inline]
    pub fn apply(self, t: f64) -> f64 {
        let t = if t.is_nan() { 0.0 } else { t.clamp(0.0, 1.0) };
        match self {
            Easing::Linear => t,
            Easing::EaseInQuad => t * t,
            Easing::EaseOutQuad => 1.0 - (1.0 - t) * (1.0 - t),
            Easing::EaseInOutCubic => {
                if t < 0.5 {
                    4.0 * t * t * t
                } else {
                    let u = -2.0 * t + 2.0;
                    1.0 - u * u * u / 2.0
                }
            }
            Easing::EaseInOutSine => -((t * std::f64::consts::PI).cos() - 1.0) / 2.0,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    const ALL: [Easing; 5] = [
        Easing::Linear,
        Easing::EaseInQuad,
        Easing::EaseOutQuad,
        Easing::EaseInOutCubic,
        Easing::EaseInOutSine,
    ];

    #[test]
    fn endpoints_are_fixed() {
        for e in ALL {
            assert_abs_diff_eq!(e.apply(0.0), 0.0, epsilon = 1e-12);
            assert_abs_diff_eq!(e.apply(1.0), 1.0, epsilon = 1e-12);
        }
    }

    #[test]
    fn out_of_range_is_clamped() {
        assert_eq!(Easing::EaseInOutCubic.apply(1.7), 1.0);
        assert_eq!(Easing::EaseInOutCubic.apply(-0.2), 0.0);
        assert_eq!(Easing::Linear.apply(f64::NAN), 0.0);
    }

    #[test]
    fn in_out_is_symmetric_at_midpoint() {
        assert_abs_diff_eq!(Easing::EaseInOutCubic.apply(0.5), 0.5, epsilon = 1e-12);
        assert_abs_diff_eq!(Easing::EaseInOutSine.apply(0.5), 0.5, epsilon = 1e-12);
    }
}
