//! Pan/tilt targets as the sink tracks them and the source validates them.

/// Pan offset bound, in degrees either side of centre.
pub const PAN_LIMIT: i32 = 85;
/// Tilt offset bound, in degrees either side of centre.
pub const TILT_LIMIT: i32 = 60;
/// Degrees moved per key press.
pub const STEP: i32 = 5;
/// Added to both offsets before transmission so the wire values are unsigned.
pub const CENTER_OFFSET: i32 = 90;
/// Largest angle the source forwards to the actuator.
pub const ACTUATOR_MAX: u32 = 180;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Direction {
    Up,
    Down,
    Left,
    Right,
}

/// Pan/tilt offsets from the centred position.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PanTilt {
    pub pan: i32,
    pub tilt: i32,
}

impl PanTilt {
    /// Move one step. Saturates at the axis bound: a step that would cross
    /// it leaves the axis at the bound and returns `false`.
    pub fn step(&mut self, direction: Direction) -> bool {
        let (axis, delta, limit) = match direction {
            Direction::Up => (&mut self.tilt, STEP, TILT_LIMIT),
            Direction::Down => (&mut self.tilt, -STEP, TILT_LIMIT),
            Direction::Left => (&mut self.pan, -STEP, PAN_LIMIT),
            Direction::Right => (&mut self.pan, STEP, PAN_LIMIT),
        };
        let next = *axis + delta;
        if next.abs() > limit {
            *axis = next.clamp(-limit, limit);
            return false;
        }
        *axis = next;
        true
    }

    /// Actuator angles `(pan, tilt)` as sent on the wire.
    pub fn to_wire(self) -> (u32, u32) {
        (
            (self.pan + CENTER_OFFSET) as u32,
            (self.tilt + CENTER_OFFSET) as u32,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pan_left_saturates_at_lower_bound() {
        let mut target = PanTilt::default();
        let accepted = (0..20).filter(|_| target.step(Direction::Left)).count();
        assert_eq!(accepted, 17);
        assert_eq!(target.pan, -PAN_LIMIT);
        assert!(!target.step(Direction::Left));
        assert_eq!(target.pan, -PAN_LIMIT);
    }

    #[test]
    fn tilt_saturates_both_ways() {
        let mut target = PanTilt::default();
        for _ in 0..12 {
            assert!(target.step(Direction::Up));
        }
        assert!(!target.step(Direction::Up));
        assert_eq!(target.tilt, TILT_LIMIT);
        assert!(target.step(Direction::Down));
        assert_eq!(target.tilt, TILT_LIMIT - STEP);
    }

    #[test]
    fn wire_values_are_centred() {
        assert_eq!(PanTilt::default().to_wire(), (90, 90));
        assert_eq!(PanTilt { pan: -85, tilt: 60 }.to_wire(), (5, 150));
    }
}
