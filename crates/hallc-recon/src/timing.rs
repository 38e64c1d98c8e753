//! Post-selection timing refinement.

use crate::hodoscope::Hodoscope;
use crate::track::TrackList;

/// Failure reported by a timing refinement.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TimingError {
    pub message: String,
}

impl std::fmt::Display for TimingError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "timing refinement failed: {}", self.message)
    }
}

impl std::error::Error for TimingError {}

/// Refines track timing once the golden track is chosen.
///
/// Runs on the full candidate set; an error makes the event fail.
pub trait TimingRefinement {
    fn refine(&self, tracks: &mut dyn TrackList, hodo: &dyn Hodoscope)
        -> Result<(), TimingError>;
}

/// Refinement that leaves tracks untouched.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoTimingRefinement;

impl TimingRefinement for NoTimingRefinement {
    fn refine(
        &self,
        _tracks: &mut dyn TrackList,
        _hodo: &dyn Hodoscope,
    ) -> Result<(), TimingError> {
        Ok(())
    }
}
