//! Built-in collaborators for running without camera, GPS or servo
//! hardware.
//!
//! - [`TestPatternCamera`]: JPEG-framed synthetic frames at the configured size
//! - [`StaticTelemetry`]: the configured location, stamped with the current time
//! - [`LoggingPwm`]: PWM writes for the servo gimbal, logged instead of sent
//! - [`ConsoleDisplay`]: logs frames and reads gimbal keys from stdin

use std::time::{SystemTime, UNIX_EPOCH};

use netcam_core::telemetry::format_iso8601;
use netcam_core::{DeviceError, Fix};
use netcam_sink::{Caption, Display, FrameView};
use netcam_source::{Capture, FrameRef, PwmOutput, Telemetry};
use tokio::sync::mpsc;
use tracing::{debug, info};

const SOI: [u8; 2] = [0xFF, 0xD8];
const EOI: [u8; 2] = [0xFF, 0xD9];
const COM: [u8; 2] = [0xFF, 0xFE];

// ── TestPatternCamera ─────────────────────────────────────────────────────────

pub struct TestPatternCamera {
    width: u32,
    height: u32,
    counter: u64,
    frame: Vec<u8>,
}

impl TestPatternCamera {
    pub fn new(width: u32, height: u32) -> Self {
        info!("Test pattern camera {}x{}", width, height);
        Self {
            width,
            height,
            counter: 0,
            frame: Vec::new(),
        }
    }

    /// Body length grows with resolution and quality, like a real encoder.
    fn body_len(&self, quality: u8) -> usize {
        let pixels = u64::from(self.width) * u64::from(self.height);
        (pixels * u64::from(quality.max(1)) / 1_000).max(64) as usize
    }
}

impl Capture for TestPatternCamera {
    fn capture(&mut self, quality: u8) -> Result<(), DeviceError> {
        if self.width == 0 || self.height == 0 {
            return Err(DeviceError::Capture {
                reason: format!("invalid frame size {}x{}", self.width, self.height),
            });
        }
        self.counter += 1;
        let comment = format!("netcam test pattern #{} q{}", self.counter, quality);
        let body = self.body_len(quality);

        self.frame.clear();
        self.frame.extend_from_slice(&SOI);
        self.frame.extend_from_slice(&COM);
        self.frame
            .extend_from_slice(&((comment.len() + 2) as u16).to_be_bytes());
        self.frame.extend_from_slice(comment.as_bytes());
        let shift = self.counter as usize;
        // no 0xFF inside the body so it never reads as a marker
        self.frame
            .extend((0..body).map(|i| ((i + shift) % 0xFF) as u8));
        self.frame.extend_from_slice(&EOI);
        Ok(())
    }

    fn frame(&self) -> Option<FrameRef<'_>> {
        (!self.frame.is_empty()).then(|| FrameRef {
            bytes: &self.frame,
            width: self.width,
            height: self.height,
        })
    }
}

// ── StaticTelemetry ───────────────────────────────────────────────────────────

pub struct StaticTelemetry {
    fix: Option<Fix>,
}

impl StaticTelemetry {
    pub fn new(fix: Option<Fix>) -> Self {
        Self { fix }
    }
}

impl Telemetry for StaticTelemetry {
    fn read(&mut self) -> Option<Fix> {
        let now = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|elapsed| elapsed.as_secs_f64())
            .unwrap_or(f64::NAN);
        self.fix.map(|fix| Fix { timestamp: now, ..fix }.sanitized())
    }

    fn reset(&mut self) {
        debug!("Telemetry reset");
    }
}

// ── LoggingPwm ────────────────────────────────────────────────────────────────

#[derive(Debug, Default)]
pub struct LoggingPwm;

impl PwmOutput for LoggingPwm {
    fn pwm_write(&mut self, pin: u8, value: u16) -> Result<(), DeviceError> {
        info!("PWM pin {} ← {}", pin, value);
        Ok(())
    }
}

// ── ConsoleDisplay ────────────────────────────────────────────────────────────

/// Logs every frame it is asked to show. Keys typed on stdin are handed
/// back one per rendered frame.
pub struct ConsoleDisplay {
    title: Option<String>,
    shown: u64,
    keys: Option<mpsc::UnboundedReceiver<char>>,
}

impl ConsoleDisplay {
    pub fn new(keys: Option<mpsc::UnboundedReceiver<char>>) -> Self {
        Self {
            title: None,
            shown: 0,
            keys,
        }
    }
}

impl Display for ConsoleDisplay {
    fn reinit(
        &mut self,
        title: &str,
        width: u32,
        height: u32,
        frame_rate: u32,
    ) -> Result<(), DeviceError> {
        if width == 0 || height == 0 {
            return Err(DeviceError::Display {
                reason: format!("invalid frame size {}x{}", width, height),
            });
        }
        info!("Window: {} ({} fps)", title, frame_rate);
        self.title = Some(title.to_owned());
        self.shown = 0;
        Ok(())
    }

    fn render(
        &mut self,
        frame: FrameView<'_>,
        caption: &Caption,
    ) -> Result<Option<char>, DeviceError> {
        if !frame.bytes.starts_with(&SOI) || !frame.bytes.ends_with(&EOI) {
            return Err(DeviceError::Display {
                reason: format!("{} bytes are not a JPEG image", frame.bytes.len()),
            });
        }
        self.shown += 1;
        if let Caption::Location(location) = caption {
            debug!("Frame at {}", format_iso8601(location.timestamp));
        }
        debug!(
            "Frame #{} {} bytes [{} x {}] {}",
            self.shown,
            frame.bytes.len(),
            frame.width,
            frame.height,
            caption
        );
        if self.shown % 100 == 0 {
            info!("Shown {} frames", self.shown);
        }
        Ok(self.keys.as_mut().and_then(|keys| keys.try_recv().ok()))
    }

    fn hide(&mut self) {
        if let Some(title) = self.title.take() {
            info!("Window {} hidden", title);
        }
    }
}

/// Forward characters typed on stdin (one line at a time) as key presses.
pub fn spawn_keyboard() -> mpsc::UnboundedReceiver<char> {
    use tokio::io::{AsyncBufReadExt, BufReader};

    let (tx, rx) = mpsc::unbounded_channel();
    tokio::spawn(async move {
        let mut lines = BufReader::new(tokio::io::stdin()).lines();
        while let Ok(Some(line)) = lines.next_line().await {
            for key in line.chars().filter(|c| !c.is_whitespace()) {
                if tx.send(key).is_err() {
                    return;
                }
            }
        }
        debug!("Keyboard input closed");
    });
    rx
}
