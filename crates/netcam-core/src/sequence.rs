use tracing::warn;

/// Per-peer sequence generator.
///
/// Issues strictly increasing values starting at 1. Zero is never handed
/// out: the sink uses it to mark an invalid reassembly window.
#[derive(Debug, Clone)]
pub struct Sequencer {
    next: u32,
}

impl Default for Sequencer {
    fn default() -> Self {
        Self { next: 1 }
    }
}

impl Sequencer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Consume and return the next sequence number.
    pub fn next(&mut self) -> u32 {
        let value = self.next;
        self.next = match value.checked_add(1) {
            Some(next) => next,
            None => {
                warn!("Sequence space exhausted, restarting at 1");
                1
            }
        };
        value
    }
}

#[cfg(test)]
mod tests {
    use super::Sequencer;

    #[test]
    fn strictly_increasing_from_one() {
        let mut seq = Sequencer::new();
        assert_eq!(seq.next(), 1);
        assert_eq!(seq.next(), 2);
        assert_eq!(seq.next(), 3);
    }

    #[test]
    fn never_issues_zero() {
        let mut seq = Sequencer { next: u32::MAX };
        assert_eq!(seq.next(), u32::MAX);
        assert_eq!(seq.next(), 1);
    }
}
