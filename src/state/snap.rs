//! Fill-level snapping for user-entered bottle levels.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SnapMode {
    /// Keep the level as entered.
    #[default]
    Continuous,
    /// 1% steps.
    Percent,
    /// 10% steps.
    Tenths,
    /// 25% steps.
    Quarters,
}

impl SnapMode {
    fn steps(&self) -> Option<f64> {
        match self {
            SnapMode::Continuous => None,
            SnapMode::Percent => Some(100.0),
            SnapMode::Tenths => Some(10.0),
            SnapMode::Quarters => Some(4.0),
        }
    }

    /// Clamp into `[0, 1]` and round to the nearest step. Idempotent.
    pub fn snap(&self, fraction: f64) -> f64 {
        if !fraction.is_finite() {
            return 0.0;
        }
        let clamped = fraction.clamp(0.0, 1.0);
        match self.steps() {
            None => clamped,
            Some(steps) => ((clamped * steps).round() / steps).clamp(0.0, 1.0),
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            SnapMode::Continuous => "continuous",
            SnapMode::Percent => "percent",
            SnapMode::Tenths => "tenths",
            SnapMode::Quarters => "quarters",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn mode_strategy() -> impl Strategy<Value = SnapMode> {
        prop_oneof![
            Just(SnapMode::Continuous),
            Just(SnapMode::Percent),
            Just(SnapMode::Tenths),
            Just(SnapMode::Quarters),
        ]
    }

    #[test]
    fn test_quarters() {
        assert_eq!(SnapMode::Quarters.snap(0.6), 0.5);
        assert_eq!(SnapMode::Quarters.snap(0.63), 0.75);
        assert_eq!(SnapMode::Quarters.snap(1.4), 1.0);
        assert_eq!(SnapMode::Quarters.snap(-0.2), 0.0);
    }

    #[test]
    fn test_non_finite_snaps_to_empty() {
        assert_eq!(SnapMode::Tenths.snap(f64::NAN), 0.0);
    }

    proptest! {
        #[test]
        fn test_snap_is_idempotent(mode in mode_strategy(), fraction in 0.0f64..=1.0) {
            let once = mode.snap(fraction);
            prop_assert_eq!(mode.snap(once), once);
            prop_assert!((0.0..=1.0).contains(&once));
        }
    }
}
