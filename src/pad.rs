//! The virtual gamepad the mapping output is written to.
//!
//! Built on a uinput virtual device with the standard Linux gamepad layout:
//! two sticks on ABS_X/Y and ABS_RX/RY, analog triggers on ABS_Z/RZ, and
//! the eight face/shoulder/menu buttons. A frame is emitted as a single
//! event batch so the kernel delivers it under one SYN report, all or
//! nothing. Only the reader task writes to the pad.

use anyhow::{Context, Result};
use evdev::uinput::VirtualDevice;
use evdev::{
    AbsInfo, AbsoluteAxisCode, AttributeSet, BusType, EventType, InputEvent, InputId, KeyCode,
    UinputAbsSetup,
};
use log::info;

use crate::mapping::{PadButton, PadFrame};

const PAD_NAME: &str = "hallpad virtual gamepad";
// Report the xpad-compatible ids so games pick the pad up as a stock
// Xbox 360 controller.
const PAD_VENDOR_ID: u16 = 0x045E;
const PAD_PRODUCT_ID: u16 = 0x028E;
const PAD_VERSION: u16 = 0x0110;

fn button_key_code(button: PadButton) -> KeyCode {
    match button {
        PadButton::A => KeyCode::BTN_SOUTH,
        PadButton::B => KeyCode::BTN_EAST,
        PadButton::X => KeyCode::BTN_WEST,
        PadButton::Y => KeyCode::BTN_NORTH,
        PadButton::LeftShoulder => KeyCode::BTN_TL,
        PadButton::RightShoulder => KeyCode::BTN_TR,
        PadButton::Start => KeyCode::BTN_START,
        PadButton::Back => KeyCode::BTN_SELECT,
    }
}

pub struct VirtualPad {
    device: VirtualDevice,
}

impl VirtualPad {
    pub fn new() -> Result<Self> {
        let mut builder = VirtualDevice::builder()
            .context("Failed to create uinput device builder (is /dev/uinput available?)")?
            .name(PAD_NAME)
            .input_id(InputId::new(
                BusType::BUS_USB,
                PAD_VENDOR_ID,
                PAD_PRODUCT_ID,
                PAD_VERSION,
            ));

        let stick_info = AbsInfo::new(0, i16::MIN as i32, i16::MAX as i32, 16, 128, 1);
        for axis in [
            AbsoluteAxisCode::ABS_X,
            AbsoluteAxisCode::ABS_Y,
            AbsoluteAxisCode::ABS_RX,
            AbsoluteAxisCode::ABS_RY,
        ] {
            builder = builder
                .with_absolute_axis(&UinputAbsSetup::new(axis, stick_info))
                .context("Failed to set up stick axis")?;
        }

        let trigger_info = AbsInfo::new(0, 0, 255, 0, 0, 1);
        for axis in [AbsoluteAxisCode::ABS_Z, AbsoluteAxisCode::ABS_RZ] {
            builder = builder
                .with_absolute_axis(&UinputAbsSetup::new(axis, trigger_info))
                .context("Failed to set up trigger axis")?;
        }

        let mut keys = AttributeSet::<KeyCode>::new();
        for button in PadButton::ALL {
            keys.insert(button_key_code(button));
        }
        builder = builder.with_keys(&keys).context("Failed to set up pad buttons")?;

        let device = builder
            .build()
            .context("Failed to build virtual gamepad device")?;

        info!("Created virtual gamepad: {PAD_NAME}");
        Ok(Self { device })
    }

    /// Emit one complete frame. Axis, trigger and every button state go out
    /// in one batch; released buttons are written explicitly each pass so
    /// the pad never holds a stale press.
    pub fn submit_frame(&mut self, frame: &PadFrame) -> Result<()> {
        let mut events = Vec::with_capacity(6 + PadButton::ALL.len());

        events.push(abs_event(AbsoluteAxisCode::ABS_X, frame.left_x as i32));
        events.push(abs_event(AbsoluteAxisCode::ABS_Y, frame.left_y as i32));
        events.push(abs_event(AbsoluteAxisCode::ABS_RX, frame.right_x as i32));
        events.push(abs_event(AbsoluteAxisCode::ABS_RY, frame.right_y as i32));
        events.push(abs_event(AbsoluteAxisCode::ABS_Z, frame.left_trigger as i32));
        events.push(abs_event(AbsoluteAxisCode::ABS_RZ, frame.right_trigger as i32));

        for button in PadButton::ALL {
            let pressed = frame.buttons.contains(&button);
            events.push(InputEvent::new(
                EventType::KEY.0,
                button_key_code(button).0,
                pressed as i32,
            ));
        }

        self.device
            .emit(&events)
            .context("Failed to emit gamepad frame")
    }

    /// Zero everything out, used on session teardown.
    pub fn release_all(&mut self) -> Result<()> {
        self.submit_frame(&PadFrame::released())
    }
}

fn abs_event(axis: AbsoluteAxisCode, value: i32) -> InputEvent {
    InputEvent::new(EventType::ABSOLUTE.0, axis.0, value)
}
