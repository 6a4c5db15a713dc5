//! Display contract and the text the viewer overlays on each frame.

use std::fmt;

use netcam_core::telemetry::format_iso8601;
use netcam_core::{DeviceError, Location, PeerId};

use crate::reassembly::FrameView;

/// Window that decodes and shows JPEG frames.
pub trait Display {
    /// (Re)create the window for a new source, frame rate or frame size.
    fn reinit(
        &mut self,
        title: &str,
        width: u32,
        height: u32,
        frame_rate: u32,
    ) -> Result<(), DeviceError>;

    /// Decode and show one frame; returns the key pressed meanwhile, if any.
    fn render(&mut self, frame: FrameView<'_>, caption: &Caption)
        -> Result<Option<char>, DeviceError>;

    /// Hide or release the window. Must be harmless when nothing is shown.
    fn hide(&mut self);
}

pub fn window_title(source: PeerId, width: u32, height: u32, frame_rate: u32) -> String {
    format!("Stream {source} [{width} x {height}] @{frame_rate} frames/s")
}

// ── Caption ───────────────────────────────────────────────────────────────────

/// Overlay text, one entry per line.
#[derive(Debug, Clone, PartialEq)]
pub enum Caption {
    /// Last location reported by the source.
    Location(Location),
    /// Source identity, frame rate and frame size.
    Stream {
        source: PeerId,
        frame_rate: u32,
        width: u32,
        height: u32,
    },
}

impl Caption {
    pub fn lines(&self) -> Vec<String> {
        match self {
            Self::Location(location) => vec![
                format_iso8601(location.timestamp),
                format!("Latitude: {:.6}", location.latitude),
                format!("Longitude: {:.6}", location.longitude),
            ],
            Self::Stream {
                source,
                frame_rate,
                width,
                height,
            } => vec![
                format!("{source} @ {frame_rate}fps"),
                format!("[{width} x {height}]"),
            ],
        }
    }
}

impl fmt::Display for Caption {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.lines().join(" | "))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stream_caption_lines() {
        let caption = Caption::Stream {
            source: 1001,
            frame_rate: 10,
            width: 640,
            height: 480,
        };
        assert_eq!(caption.lines(), vec!["1001 @ 10fps", "[640 x 480]"]);
        assert_eq!(caption.to_string(), "1001 @ 10fps | [640 x 480]");
    }

    #[test]
    fn location_caption_lines() {
        let caption = Caption::Location(Location {
            timestamp: 0.5,
            latitude: 28.6139,
            longitude: -77.209,
        });
        assert_eq!(
            caption.lines(),
            vec![
                "1970-01-01T00:00:00.500Z",
                "Latitude: 28.613900",
                "Longitude: -77.209000"
            ]
        );
    }

    #[test]
    fn title_names_source_size_and_rate() {
        assert_eq!(window_title(42, 320, 240, 5), "Stream 42 [320 x 240] @5 frames/s");
    }
}
