use super::prune::CutOutcome;
use super::scin::ScinScore;

/// Reusable per-event scratch state of golden-track selection.
///
/// Reset at the start of every selection, so one instance can serve a whole
/// run. After a selection it describes that event only: scintillator scores
/// for scintillator selection, keep flags, reject codes and cut outcomes for
/// prune selection. Entries the active method does not produce read as `None`.
#[derive(Debug, Clone, Default)]
pub struct SelectionWorkspace {
    pub(super) scin_scores: Vec<Option<ScinScore>>,
    pub(super) keep: Vec<bool>,
    pub(super) reject: Vec<u32>,
    pub(super) cut_log: Vec<CutOutcome>,
}

impl SelectionWorkspace {
    pub fn new() -> Self {
        Self::default()
    }

    pub(super) fn reset(&mut self, n_tracks: usize) {
        self.scin_scores.clear();
        self.scin_scores.resize(n_tracks, None);
        self.keep.clear();
        self.reject.clear();
        self.cut_log.clear();
    }

    /// Paddle distances of candidate `index`, if it was scored.
    pub fn scin_score(&self, index: usize) -> Option<ScinScore> {
        self.scin_scores.get(index).copied().flatten()
    }

    /// Whether candidate `index` survived pruning.
    pub fn is_kept(&self, index: usize) -> Option<bool> {
        self.keep.get(index).copied()
    }

    /// Sum of the reject codes of every applied cut candidate `index` failed.
    pub fn reject_code(&self, index: usize) -> Option<u32> {
        self.reject.get(index).copied()
    }

    /// Prune cuts in application order.
    pub fn cut_outcomes(&self) -> &[CutOutcome] {
        &self.cut_log
    }
}
