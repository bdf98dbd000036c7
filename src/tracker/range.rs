//! Validated frame range with its traversal seed.

use crate::error::ConfigError;

/// Closed interval `[lower, upper]` of frame indices with the seed frame `initial`.
///
/// Invariant: `lower <= initial <= upper`, and the number of traversal
/// steps fits in a `u32`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct FrameRange {
    lower: u32,
    initial: u32,
    upper: u32,
}

impl FrameRange {
    pub fn new(lower: u32, initial: u32, upper: u32) -> Result<Self, ConfigError> {
        if lower > upper {
            return Err(ConfigError::InvalidFrameRange { lower, upper });
        }
        if initial < lower || initial > upper {
            return Err(ConfigError::InitialFrameOutOfRange {
                lower,
                initial,
                upper,
            });
        }
        let steps = (upper - lower)
            .checked_add(1)
            .and_then(|len| len.checked_add(u32::from(lower != initial)));
        if steps.is_none() {
            return Err(ConfigError::FrameRangeTooLarge { lower, upper });
        }
        Ok(Self {
            lower,
            initial,
            upper,
        })
    }

    /// Range seeded at its lower bound.
    pub fn from_bounds(lower: u32, upper: u32) -> Result<Self, ConfigError> {
        Self::new(lower, lower, upper)
    }

    pub fn lower(&self) -> u32 {
        self.lower
    }

    pub fn initial(&self) -> u32 {
        self.initial
    }

    pub fn upper(&self) -> u32 {
        self.upper
    }

    /// Number of frames in the range.
    pub fn len(&self) -> u32 {
        self.upper - self.lower + 1
    }

    pub fn is_empty(&self) -> bool {
        false
    }

    pub fn contains(&self, index: u32) -> bool {
        self.lower <= index && index <= self.upper
    }

    /// Whether a decreasing pass follows the increasing one.
    pub fn has_decreasing_pass(&self) -> bool {
        self.lower != self.initial
    }

    /// Number of per-frame steps of a full traversal.
    ///
    /// The seed frame is visited by both passes, so it counts twice whenever
    /// a decreasing pass exists.
    pub fn total_iterations(&self) -> u32 {
        self.len() + u32::from(self.has_decreasing_pass())
    }

    /// Restrict the range to a sequence of `frame_count` frames.
    ///
    /// Returns `None` if no frame of the range exists in the sequence.
    pub fn clamp_to_frame_count(&self, frame_count: u32) -> Option<Self> {
        if self.lower >= frame_count {
            return None;
        }
        let upper = self.upper.min(frame_count - 1);
        Some(Self {
            lower: self.lower,
            initial: self.initial.min(upper),
            upper,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validation() {
        assert!(FrameRange::new(3, 3, 3).is_ok());
        assert_eq!(
            FrameRange::new(5, 5, 4),
            Err(ConfigError::InvalidFrameRange { lower: 5, upper: 4 })
        );
        assert_eq!(
            FrameRange::new(2, 1, 4),
            Err(ConfigError::InitialFrameOutOfRange {
                lower: 2,
                initial: 1,
                upper: 4
            })
        );
        assert!(FrameRange::new(2, 5, 4).is_err());

        // every u32 index would need 2^32 steps
        assert_eq!(
            FrameRange::new(0, 0, u32::MAX),
            Err(ConfigError::FrameRangeTooLarge {
                lower: 0,
                upper: u32::MAX
            })
        );
        assert!(FrameRange::new(0, 1, u32::MAX - 1).is_err());

        let widest = FrameRange::new(0, 0, u32::MAX - 1).unwrap();
        assert_eq!(widest.len(), u32::MAX);
        assert_eq!(widest.total_iterations(), u32::MAX);
        let widest = FrameRange::new(1, 1, u32::MAX).unwrap();
        assert_eq!(widest.total_iterations(), u32::MAX);
    }

    #[test]
    fn test_total_iterations() {
        let range = FrameRange::new(10, 12, 15).unwrap();
        assert_eq!(range.len(), 6);
        assert_eq!(range.total_iterations(), 7);

        let range = FrameRange::new(10, 10, 15).unwrap();
        assert_eq!(range.total_iterations(), 6);

        let range = FrameRange::new(4, 4, 4).unwrap();
        assert_eq!(range.total_iterations(), 1);
        assert!(!range.has_decreasing_pass());
    }

    #[test]
    fn test_clamp_to_frame_count() {
        let range = FrameRange::new(2, 8, 20).unwrap();
        assert_eq!(
            range.clamp_to_frame_count(6),
            Some(FrameRange::new(2, 5, 5).unwrap())
        );
        assert_eq!(range.clamp_to_frame_count(30), Some(range));
        assert_eq!(range.clamp_to_frame_count(2), None);
    }
}
