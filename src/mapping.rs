//! Aggregation of the active-key table into one virtual gamepad frame.
//!
//! Every pass rebuilds the frame from scratch: triggers combine by maximum,
//! opposing directions on the same stick axis cancel through signed
//! accumulation, and buttons latch on above a fixed threshold of the 8-bit
//! trigger scale. A key without a binding contributes nothing.

use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use strum_macros::{Display, EnumString};

use crate::curve::{map_pressure, Settings, PRESSURE_SCALE};

/// Pressed state threshold for button actions, on the 0..=255 trigger scale.
const BUTTON_PRESS_THRESHOLD: u8 = 100;

/// The closed set of actions a key can be bound to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, Serialize, Deserialize)]
#[strum(serialize_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum KeyAction {
    LeftTrigger,
    RightTrigger,
    LeftStickXPlus,
    LeftStickXMinus,
    LeftStickYPlus,
    LeftStickYMinus,
    RightStickXPlus,
    RightStickXMinus,
    RightStickYPlus,
    RightStickYMinus,
    ButtonA,
    ButtonB,
    ButtonX,
    ButtonY,
    ButtonLeftShoulder,
    ButtonRightShoulder,
    ButtonStart,
    ButtonBack,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display)]
pub enum PadButton {
    A,
    B,
    X,
    Y,
    LeftShoulder,
    RightShoulder,
    Start,
    Back,
}

impl PadButton {
    pub const ALL: [PadButton; 8] = [
        PadButton::A,
        PadButton::B,
        PadButton::X,
        PadButton::Y,
        PadButton::LeftShoulder,
        PadButton::RightShoulder,
        PadButton::Start,
        PadButton::Back,
    ];
}

/// One complete virtual controller state, submitted to the pad as a unit.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct PadFrame {
    pub left_x: i16,
    pub left_y: i16,
    pub right_x: i16,
    pub right_y: i16,
    pub left_trigger: u8,
    pub right_trigger: u8,
    pub buttons: HashSet<PadButton>,
}

impl PadFrame {
    /// The all-zero, nothing-pressed frame.
    pub fn released() -> Self {
        Self::default()
    }
}

/// Add a signed contribution to a stick axis, saturating at the i16 range
/// on every step (not once at the end), matching the reference behavior
/// when several keys drive the same axis.
fn accumulate_axis(axis: i16, contribution: i16, negative: bool) -> i16 {
    let delta = if negative {
        -(contribution as i32)
    } else {
        contribution as i32
    };
    (axis as i32 + delta).clamp(i16::MIN as i32, i16::MAX as i32) as i16
}

/// Build one frame from a snapshot of the active keys.
///
/// Iteration order over the snapshot is unspecified; trigger maxima and
/// button thresholds are order-independent by construction, and axis sums
/// only depend on order when per-step saturation kicks in.
pub fn build_frame(
    snapshot: &HashMap<u8, u16>,
    bindings: &HashMap<String, KeyAction>,
    settings: &Settings,
) -> PadFrame {
    let mut frame = PadFrame::released();

    for (&key_id, &pressure) in snapshot {
        let action = match bindings.get(&key_id.to_string()) {
            Some(action) => *action,
            None => continue,
        };

        let value = map_pressure(pressure, settings);
        let trig = (value * 255 / PRESSURE_SCALE).clamp(0, 255) as u8;
        let axis = value.clamp(0, PRESSURE_SCALE) as i16;

        use KeyAction::*;
        match action {
            LeftTrigger => frame.left_trigger = frame.left_trigger.max(trig),
            RightTrigger => frame.right_trigger = frame.right_trigger.max(trig),
            LeftStickXPlus => frame.left_x = accumulate_axis(frame.left_x, axis, false),
            LeftStickXMinus => frame.left_x = accumulate_axis(frame.left_x, axis, true),
            LeftStickYPlus => frame.left_y = accumulate_axis(frame.left_y, axis, false),
            LeftStickYMinus => frame.left_y = accumulate_axis(frame.left_y, axis, true),
            RightStickXPlus => frame.right_x = accumulate_axis(frame.right_x, axis, false),
            RightStickXMinus => frame.right_x = accumulate_axis(frame.right_x, axis, true),
            RightStickYPlus => frame.right_y = accumulate_axis(frame.right_y, axis, false),
            RightStickYMinus => frame.right_y = accumulate_axis(frame.right_y, axis, true),
            ButtonA => press_if(&mut frame.buttons, PadButton::A, trig),
            ButtonB => press_if(&mut frame.buttons, PadButton::B, trig),
            ButtonX => press_if(&mut frame.buttons, PadButton::X, trig),
            ButtonY => press_if(&mut frame.buttons, PadButton::Y, trig),
            ButtonLeftShoulder => press_if(&mut frame.buttons, PadButton::LeftShoulder, trig),
            ButtonRightShoulder => press_if(&mut frame.buttons, PadButton::RightShoulder, trig),
            ButtonStart => press_if(&mut frame.buttons, PadButton::Start, trig),
            ButtonBack => press_if(&mut frame.buttons, PadButton::Back, trig),
        }
    }

    frame
}

fn press_if(buttons: &mut HashSet<PadButton>, button: PadButton, trig: u8) {
    if trig > BUTTON_PRESS_THRESHOLD {
        buttons.insert(button);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn bindings(entries: &[(u8, KeyAction)]) -> HashMap<String, KeyAction> {
        entries
            .iter()
            .map(|(id, action)| (id.to_string(), *action))
            .collect()
    }

    fn snapshot(entries: &[(u8, u16)]) -> HashMap<u8, u16> {
        entries.iter().copied().collect()
    }

    #[test]
    fn test_worked_example_full_press() {
        // raw 700, deadzone 30, max 600, linear, sensitivity 1.0:
        // norm saturates at 1.0, the stick axis gets full scale.
        let frame = build_frame(
            &snapshot(&[(4, 700)]),
            &bindings(&[(4, KeyAction::LeftStickXPlus)]),
            &Settings::default(),
        );
        assert_eq!(frame.left_x, PRESSURE_SCALE as i16);
        assert_eq!(frame.left_y, 0);
        assert!(frame.buttons.is_empty());
    }

    #[test]
    fn test_unbound_key_contributes_nothing() {
        let frame = build_frame(
            &snapshot(&[(99, 700)]),
            &bindings(&[(4, KeyAction::RightTrigger)]),
            &Settings::default(),
        );
        assert_eq!(frame, PadFrame::released());
    }

    #[test]
    fn test_opposing_directions_cancel() {
        let frame = build_frame(
            &snapshot(&[(4, 400), (7, 400)]),
            &bindings(&[
                (4, KeyAction::LeftStickXPlus),
                (7, KeyAction::LeftStickXMinus),
            ]),
            &Settings::default(),
        );
        assert_eq!(frame.left_x, 0);
    }

    #[test]
    fn test_same_direction_saturates() {
        let frame = build_frame(
            &snapshot(&[(4, 700), (7, 700)]),
            &bindings(&[
                (4, KeyAction::LeftStickYPlus),
                (7, KeyAction::LeftStickYPlus),
            ]),
            &Settings::default(),
        );
        assert_eq!(frame.left_y, i16::MAX);
    }

    #[test]
    fn test_accumulate_axis_clamps_each_step() {
        // Saturation applies on every addition, so a full-range overshoot
        // is lost before a later opposing key is applied.
        let one = accumulate_axis(0, i16::MAX, false);
        let two = accumulate_axis(one, i16::MAX, false);
        assert_eq!(two, i16::MAX);
        assert_eq!(accumulate_axis(two, i16::MAX, true), 0);
        assert_eq!(accumulate_axis(i16::MIN, 1, true), i16::MIN);
    }

    #[test]
    fn test_triggers_combine_by_max() {
        // Two keys on the same trigger: output is the larger, not the sum.
        let s = Settings::default();
        let frame = build_frame(
            &snapshot(&[(4, 210), (7, 370)]),
            &bindings(&[(4, KeyAction::RightTrigger), (7, KeyAction::RightTrigger)]),
            &s,
        );
        let expected = (map_pressure(370, &s) * 255 / PRESSURE_SCALE) as u8;
        let lesser = (map_pressure(210, &s) * 255 / PRESSURE_SCALE) as u8;
        assert_eq!(frame.right_trigger, expected);
        assert!(frame.right_trigger > lesser);
        assert!((frame.right_trigger as u16) < lesser as u16 + expected as u16);
    }

    #[test]
    fn test_button_threshold_on_trigger_scale() {
        let s = Settings::default();
        // Threshold is trig > 100 on the 8-bit scale, not on the raw value.
        let frame = build_frame(
            &snapshot(&[(4, 600)]),
            &bindings(&[(4, KeyAction::ButtonA)]),
            &s,
        );
        assert!(frame.buttons.contains(&PadButton::A));

        let frame = build_frame(
            &snapshot(&[(4, 100)]),
            &bindings(&[(4, KeyAction::ButtonA)]),
            &s,
        );
        assert!(frame.buttons.is_empty());
    }

    #[test]
    fn test_combined_frame() {
        let s = Settings::default();
        let frame = build_frame(
            &snapshot(&[(4, 700), (7, 700), (9, 700), (44, 700)]),
            &bindings(&[
                (4, KeyAction::LeftStickXPlus),
                (7, KeyAction::LeftTrigger),
                (9, KeyAction::ButtonStart),
                (44, KeyAction::RightStickYMinus),
            ]),
            &s,
        );
        assert_eq!(frame.left_x, i16::MAX);
        assert_eq!(frame.right_y, -(PRESSURE_SCALE as i16));
        assert_eq!(frame.left_trigger, 255);
        assert_eq!(frame.right_trigger, 0);
        assert_eq!(frame.buttons, HashSet::from([PadButton::Start]));
    }

    #[test]
    fn test_action_names_round_trip_config_form() {
        let yaml = serde_yaml::to_string(&KeyAction::LeftStickXPlus).unwrap();
        assert_eq!(yaml.trim(), "left_stick_x_plus");
        let action: KeyAction = serde_yaml::from_str("button_left_shoulder").unwrap();
        assert_eq!(action, KeyAction::ButtonLeftShoulder);
    }
}
