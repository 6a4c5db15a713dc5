//! Sink-side reassembly of one JPEG frame from its data envelopes.
//!
//! ```text
//!          open(size, w, h, seq)         append(seq, bytes)…
//! EMPTY ─────────────────────────► OPEN ───────────────────► COMPLETE
//!   ▲                                                            │
//!   └──────────── take_complete() / next open() ◄────────────────┘
//! ```
//!
//! `filled <= size <= capacity` holds at all times. A window declaring more
//! than the buffer holds, or opened with sequence 0, is invalid: it has size
//! and sequence 0 and no data envelope can ever complete it.

use netcam_core::{DropReason, PeerId};

/// Outcome of opening a new window.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Opening {
    /// Oversized or unsequenced; the window cannot complete.
    Invalid,
    /// Same dimensions as the previous frame.
    Ready,
    /// Width or height changed since the previous frame.
    Resized,
}

/// A completed frame, borrowed from the window buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameView<'a> {
    pub bytes: &'a [u8],
    pub width: u32,
    pub height: u32,
}

#[derive(Debug)]
pub struct ReassemblyWindow {
    source: PeerId,
    frame_rate: u32,
    frames: u32,
    sequence: u32,
    size: usize,
    filled: usize,
    width: u32,
    height: u32,
    consumed: bool,
    buffer: Box<[u8]>,
}

impl ReassemblyWindow {
    pub fn new(capacity: usize) -> Self {
        Self {
            source: 0,
            frame_rate: 0,
            frames: 0,
            sequence: 0,
            size: 0,
            filled: 0,
            width: 0,
            height: 0,
            consumed: false,
            buffer: vec![0u8; capacity].into_boxed_slice(),
        }
    }

    pub fn capacity(&self) -> usize {
        self.buffer.len()
    }

    /// Bound source, 0 before the first accepted acknowledgement.
    pub fn source(&self) -> PeerId {
        self.source
    }

    pub fn frame_rate(&self) -> u32 {
        self.frame_rate
    }

    pub fn sequence(&self) -> u32 {
        self.sequence
    }

    pub fn size(&self) -> usize {
        self.size
    }

    pub fn filled(&self) -> usize {
        self.filled
    }

    pub fn dimensions(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    /// Bind to `source` streaming at `frame_rate`.
    ///
    /// Returns `true` when either changed; the whole window is then reset.
    pub fn bind(&mut self, source: PeerId, frame_rate: u32) -> bool {
        if self.source == source && self.frame_rate == frame_rate {
            return false;
        }
        self.reset();
        self.source = source;
        self.frame_rate = frame_rate;
        true
    }

    /// Forget the bound source and any frame in progress.
    pub fn reset(&mut self) {
        self.source = 0;
        self.frame_rate = 0;
        self.frames = 0;
        self.sequence = 0;
        self.size = 0;
        self.filled = 0;
        self.width = 0;
        self.height = 0;
        self.consumed = false;
    }

    /// Start a new frame. Counts towards this cycle's frames even when the
    /// declared size is rejected.
    pub fn open(&mut self, size: u32, width: u32, height: u32, sequence: u32) -> Opening {
        self.frames = self.frames.saturating_add(1);
        self.filled = 0;
        self.consumed = false;

        let size = size as usize;
        if size > self.buffer.len() || sequence == 0 {
            self.sequence = 0;
            self.size = 0;
            return Opening::Invalid;
        }
        self.sequence = sequence;
        self.size = size;

        if (self.width, self.height) != (width, height) {
            self.width = width;
            self.height = height;
            return Opening::Resized;
        }
        Opening::Ready
    }

    /// Append one data chunk of the open frame.
    ///
    /// Chunks for any other sequence, or that would overrun the declared
    /// size, are rejected whole.
    pub fn append(&mut self, sequence: u32, bytes: &[u8]) -> Result<(), DropReason> {
        if sequence == 0 || sequence != self.sequence {
            return Err(DropReason::SequenceMismatch {
                expected: self.sequence,
                got: sequence,
            });
        }
        let end = self.filled + bytes.len();
        if end > self.size {
            return Err(DropReason::WindowOverflow {
                len: bytes.len(),
                accumulated: self.filled,
                declared: self.size,
            });
        }
        self.buffer[self.filled..end].copy_from_slice(bytes);
        self.filled = end;
        Ok(())
    }

    pub fn is_complete(&self) -> bool {
        self.size > 0 && self.filled == self.size
    }

    /// Hand out the completed frame once; later calls return `None` until
    /// another frame completes.
    pub fn take_complete(&mut self) -> Option<FrameView<'_>> {
        if !self.is_complete() || self.consumed {
            return None;
        }
        self.consumed = true;
        Some(FrameView {
            bytes: &self.buffer[..self.size],
            width: self.width,
            height: self.height,
        })
    }

    /// Drop a completed frame without handing it out.
    pub fn discard(&mut self) {
        self.consumed = true;
    }

    /// Frames opened since the last call.
    pub fn take_frame_count(&mut self) -> u32 {
        std::mem::take(&mut self.frames)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn bound(capacity: usize) -> ReassemblyWindow {
        let mut window = ReassemblyWindow::new(capacity);
        window.bind(7, 10);
        window
    }

    #[test]
    fn two_chunks_complete_and_extra_byte_is_dropped() {
        let mut window = bound(1_024);
        assert_eq!(window.open(500, 640, 480, 42), Opening::Resized);

        window.append(42, &[1; 300]).unwrap();
        assert!(!window.is_complete());
        window.append(42, &[2; 200]).unwrap();
        assert!(window.is_complete());

        assert_eq!(
            window.append(42, &[3]),
            Err(DropReason::WindowOverflow { len: 1, accumulated: 500, declared: 500 })
        );
        let frame = window.take_complete().unwrap();
        assert_eq!(frame.bytes.len(), 500);
        assert_eq!(frame.bytes[299], 1);
        assert_eq!(frame.bytes[300], 2);
        assert_eq!((frame.width, frame.height), (640, 480));
    }

    #[test]
    fn oversized_frame_opens_invalid_window() {
        let mut window = bound(1_024);
        assert_eq!(window.open(1_025, 640, 480, 9), Opening::Invalid);
        assert_eq!(window.sequence(), 0);
        assert_eq!(window.size(), 0);

        for sequence in [0, 9, 10] {
            assert!(window.append(sequence, &[0; 10]).is_err());
        }
        assert!(!window.is_complete());
        assert!(window.take_complete().is_none());

        assert_eq!(window.open(10, 640, 480, 11), Opening::Resized);
        window.append(11, &[0; 10]).unwrap();
        assert!(window.is_complete());
    }

    #[test]
    fn frame_filling_the_whole_buffer_is_valid() {
        let mut window = bound(1_024);
        assert_eq!(window.open(1_024, 640, 480, 9), Opening::Resized);
        assert_eq!(window.size(), 1_024);

        window.append(9, &[7; 1_000]).unwrap();
        window.append(9, &[8; 24]).unwrap();
        let frame = window.take_complete().unwrap();
        assert_eq!(frame.bytes.len(), 1_024);
        assert_eq!(frame.bytes[1_023], 8);
    }

    #[test]
    fn zero_sequence_opens_invalid_window() {
        let mut window = bound(1_024);
        assert_eq!(window.open(10, 640, 480, 0), Opening::Invalid);
        assert!(window.append(0, &[]).is_err());
        assert!(!window.is_complete());
    }

    #[test]
    fn mismatched_sequence_leaves_window_untouched() {
        let mut window = bound(1_024);
        window.open(100, 640, 480, 5);
        window.append(5, &[0; 40]).unwrap();

        assert_eq!(
            window.append(4, &[0; 10]),
            Err(DropReason::SequenceMismatch { expected: 5, got: 4 })
        );
        assert_eq!(window.filled(), 40);
    }

    #[test]
    fn completed_frame_is_handed_out_once() {
        let mut window = bound(64);
        window.open(4, 2, 2, 1);
        window.append(1, &[1, 2, 3, 4]).unwrap();
        assert!(window.take_complete().is_some());
        assert!(window.take_complete().is_none());
    }

    #[test]
    fn same_dimensions_do_not_resize() {
        let mut window = bound(64);
        assert_eq!(window.open(4, 2, 2, 1), Opening::Resized);
        assert_eq!(window.open(4, 2, 2, 2), Opening::Ready);
        assert_eq!(window.open(4, 3, 2, 3), Opening::Resized);
    }

    #[test]
    fn rebinding_resets_everything() {
        let mut window = bound(64);
        window.open(4, 2, 2, 1);
        window.append(1, &[0; 4]).unwrap();

        assert!(!window.bind(7, 10));
        assert!(window.is_complete());

        assert!(window.bind(7, 12));
        assert_eq!(window.frame_rate(), 12);
        assert!(!window.is_complete());
        assert_eq!(window.dimensions(), (0, 0));
        assert_eq!(window.take_frame_count(), 0);
    }

    #[test]
    fn frame_count_includes_invalid_windows() {
        let mut window = bound(8);
        window.open(4, 2, 2, 1);
        window.open(100, 2, 2, 2);
        assert_eq!(window.take_frame_count(), 2);
        assert_eq!(window.take_frame_count(), 0);
    }
}
