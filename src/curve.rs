//! Pressure response: deadzone gating, normalization, curve shaping and
//! sensitivity scaling from a raw 16-bit pressure sample to the 0..=32767
//! value the mapping pass works with.

use serde::{Deserialize, Deserializer, Serialize};
use std::str::FromStr;
use strum_macros::{Display, EnumString};

/// Full scale of a mapped pressure value, matching the positive range of a
/// signed 16-bit stick axis.
pub const PRESSURE_SCALE: i32 = 32767;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Display, EnumString, Serialize)]
#[strum(serialize_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum PressureCurve {
    #[default]
    Linear,
    /// sqrt: fast initial response, flattens near full press.
    Aggressive,
    /// squared: soft initial response, steep near full press.
    Smooth,
}

// An unrecognized curve name in the config behaves as linear rather than
// failing the whole load.
impl<'de> Deserialize<'de> for PressureCurve {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let name = String::deserialize(deserializer)?;
        Ok(PressureCurve::from_str(&name).unwrap_or_default())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub deadzone: u16,
    pub sensitivity: f32,
    pub max_pressure: u16,
    pub analog_mode: bool,
    pub curve: PressureCurve,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            deadzone: 30,
            sensitivity: 1.0,
            max_pressure: 600,
            analog_mode: true,
            curve: PressureCurve::Linear,
        }
    }
}

/// Map a raw pressure sample to `0..=PRESSURE_SCALE`.
///
/// With `analog_mode` off this is a plain threshold: full scale above the
/// deadzone, zero otherwise. Otherwise the value is normalized over
/// `(deadzone, max_pressure]`, shaped by the curve, scaled by sensitivity
/// and clamped. The final clamp is required: sensitivity above 1.0 can push
/// the scaled value past full range. Degenerate settings
/// (`max_pressure <= deadzone`) yield zero instead of dividing by zero.
pub fn map_pressure(raw: u16, s: &Settings) -> i32 {
    if !s.analog_mode {
        return if raw > s.deadzone { PRESSURE_SCALE } else { 0 };
    }
    if raw <= s.deadzone {
        return 0;
    }
    if s.max_pressure <= s.deadzone {
        return 0;
    }

    let span = (s.max_pressure - s.deadzone) as f32;
    let norm = (((raw - s.deadzone) as f32) / span).min(1.0);

    let shaped = match s.curve {
        PressureCurve::Aggressive => norm.sqrt(),
        PressureCurve::Smooth => norm * norm,
        PressureCurve::Linear => norm,
    };

    ((shaped * s.sensitivity * PRESSURE_SCALE as f32) as i32).clamp(0, PRESSURE_SCALE)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn settings(curve: PressureCurve) -> Settings {
        Settings {
            curve,
            ..Settings::default()
        }
    }

    #[test]
    fn test_below_deadzone_is_zero() {
        let s = settings(PressureCurve::Linear);
        assert_eq!(map_pressure(0, &s), 0);
        assert_eq!(map_pressure(29, &s), 0);
        assert_eq!(map_pressure(30, &s), 0); // deadzone itself is not a press
    }

    #[test]
    fn test_full_press_saturates() {
        // raw 700 with deadzone 30, max 600: norm = min(1, 670/570) = 1.0.
        let s = settings(PressureCurve::Linear);
        assert_eq!(map_pressure(700, &s), PRESSURE_SCALE);
        assert_eq!(map_pressure(600, &s), PRESSURE_SCALE);
        assert_eq!(map_pressure(u16::MAX, &s), PRESSURE_SCALE);
    }

    #[test]
    fn test_monotonic_within_range() {
        for curve in [
            PressureCurve::Linear,
            PressureCurve::Aggressive,
            PressureCurve::Smooth,
        ] {
            let s = settings(curve);
            let mut prev = 0;
            for raw in 31..=600 {
                let v = map_pressure(raw, &s);
                assert!(v >= prev, "{curve} not monotonic at raw={raw}");
                prev = v;
            }
            assert_eq!(prev, PRESSURE_SCALE);
        }
    }

    #[test]
    fn test_curve_ordering() {
        // smooth <= linear <= aggressive everywhere strictly inside the range.
        for raw in (31..600).step_by(7) {
            let smooth = map_pressure(raw, &settings(PressureCurve::Smooth));
            let linear = map_pressure(raw, &settings(PressureCurve::Linear));
            let aggressive = map_pressure(raw, &settings(PressureCurve::Aggressive));
            assert!(smooth <= linear, "raw={raw}");
            assert!(linear <= aggressive, "raw={raw}");
        }
    }

    #[test]
    fn test_digital_mode_is_two_valued() {
        let s = Settings {
            analog_mode: false,
            ..Settings::default()
        };
        for raw in 0..=1000 {
            let v = map_pressure(raw, &s);
            assert!(v == 0 || v == PRESSURE_SCALE);
        }
        assert_eq!(map_pressure(31, &s), PRESSURE_SCALE);
        assert_eq!(map_pressure(30, &s), 0);
    }

    #[test]
    fn test_degenerate_max_pressure_yields_zero() {
        let s = Settings {
            deadzone: 100,
            max_pressure: 100,
            ..Settings::default()
        };
        assert_eq!(map_pressure(500, &s), 0);
        let s = Settings {
            deadzone: 100,
            max_pressure: 50,
            ..Settings::default()
        };
        assert_eq!(map_pressure(500, &s), 0);
    }

    #[test]
    fn test_sensitivity_scales_and_clamps() {
        let half = Settings {
            sensitivity: 0.5,
            ..Settings::default()
        };
        assert_eq!(map_pressure(600, &half), PRESSURE_SCALE / 2);

        let zero = Settings {
            sensitivity: 0.0,
            ..Settings::default()
        };
        assert_eq!(map_pressure(600, &zero), 0);

        // Oversensitive input must clamp, not overflow past full scale.
        let hot = Settings {
            sensitivity: 3.0,
            ..Settings::default()
        };
        assert_eq!(map_pressure(300, &hot), PRESSURE_SCALE);
    }

    #[test]
    fn test_unknown_curve_name_falls_back_to_linear() {
        let curve: PressureCurve = serde_yaml::from_str("\"bezier\"").unwrap();
        assert_eq!(curve, PressureCurve::Linear);
        let curve: PressureCurve = serde_yaml::from_str("\"aggressive\"").unwrap();
        assert_eq!(curve, PressureCurve::Aggressive);
    }
}
