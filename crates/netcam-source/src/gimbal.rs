//! Servo gimbal on a 12-bit PWM controller.
//!
//! # Channels
//!
//! ```text
//! pin 0  pan
//! pin 2  roll
//! pin 4  tilt
//! ```
//!
//! Hobby servos run at 50 Hz and map 0..=180 degrees onto a 0.5..=2.5 ms
//! pulse. The register driver behind [`PwmOutput`] (I2C or otherwise) is
//! supplied by the caller.

use netcam_core::gimbal::ACTUATOR_MAX;
use netcam_core::DeviceError;
use tracing::debug;

use crate::devices::Actuator;

pub const PAN_PIN: u8 = 0;
pub const ROLL_PIN: u8 = 2;
pub const TILT_PIN: u8 = 4;

/// Servo refresh rate.
pub const SERVO_FREQUENCY_HZ: f32 = 50.0;
/// PWM resolution (12-bit counter).
pub const PWM_MAX: u16 = 4_096;
/// Angle every axis is moved to on reset.
pub const CENTER: u32 = 90;

/// Raw PWM channel writer.
pub trait PwmOutput {
    fn pwm_write(&mut self, pin: u8, value: u16) -> Result<(), DeviceError>;
}

/// PWM counter value for a servo angle in degrees.
pub fn pulse_value(degrees: u32) -> u16 {
    let period_ms = 1_000.0 / SERVO_FREQUENCY_HZ;
    let pulse_ms = degrees as f32 / 90.0 + 0.5;
    let value = (f32::from(PWM_MAX) * pulse_ms / period_ms + 0.5) as i32;
    value.clamp(0, i32::from(PWM_MAX)) as u16
}

// ── ServoGimbal ───────────────────────────────────────────────────────────────

/// Three-axis servo gimbal.
///
/// Writes only when an axis actually moves; angles above 180 are ignored.
#[derive(Debug)]
pub struct ServoGimbal<P> {
    pwm: P,
    pan: Option<u32>,
    roll: Option<u32>,
    tilt: Option<u32>,
}

impl<P: PwmOutput> ServoGimbal<P> {
    pub fn new(pwm: P) -> Self {
        Self {
            pwm,
            pan: None,
            roll: None,
            tilt: None,
        }
    }

    /// Centre all three axes.
    pub fn reset(&mut self) -> Result<(), DeviceError> {
        self.set_pan(CENTER)?;
        self.set_roll(CENTER)?;
        self.set_tilt(CENTER)
    }

    pub fn set_roll(&mut self, degrees: u32) -> Result<(), DeviceError> {
        Self::move_axis(&mut self.pwm, &mut self.roll, ROLL_PIN, degrees)
    }

    pub fn pan(&self) -> Option<u32> {
        self.pan
    }

    pub fn roll(&self) -> Option<u32> {
        self.roll
    }

    pub fn tilt(&self) -> Option<u32> {
        self.tilt
    }

    fn move_axis(
        pwm: &mut P,
        current: &mut Option<u32>,
        pin: u8,
        degrees: u32,
    ) -> Result<(), DeviceError> {
        if *current == Some(degrees) || degrees > ACTUATOR_MAX {
            return Ok(());
        }
        let value = pulse_value(degrees);
        debug!("Servo pin {} → {}° (pwm {})", pin, degrees, value);
        pwm.pwm_write(pin, value)?;
        *current = Some(degrees);
        Ok(())
    }
}

impl<P: PwmOutput> Actuator for ServoGimbal<P> {
    fn set_pan(&mut self, degrees: u32) -> Result<(), DeviceError> {
        Self::move_axis(&mut self.pwm, &mut self.pan, PAN_PIN, degrees)
    }

    fn set_tilt(&mut self, degrees: u32) -> Result<(), DeviceError> {
        Self::move_axis(&mut self.pwm, &mut self.tilt, TILT_PIN, degrees)
    }
}
