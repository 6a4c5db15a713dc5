//! Keyboard commands read back from the display.

use netcam_core::Direction;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyCommand {
    /// Step the gimbal one notch.
    Move(Direction),
    /// Switch the caption between stream info and location.
    ToggleLocation,
}

impl KeyCommand {
    /// `w`/`s` tilt up/down, `a`/`d` pan left/right, `l` toggles location.
    /// Case-insensitive; any other key maps to nothing.
    pub fn from_key(key: char) -> Option<Self> {
        match key.to_ascii_lowercase() {
            'w' => Some(Self::Move(Direction::Up)),
            's' => Some(Self::Move(Direction::Down)),
            'a' => Some(Self::Move(Direction::Left)),
            'd' => Some(Self::Move(Direction::Right)),
            'l' => Some(Self::ToggleLocation),
            _ => None,
        }
    }
}
