//! Golden-track selection.
//!
//! ## Strategies
//!
//! 1. **Sorted-first** – optionally sort candidates by chi2/ndof in place and
//!    take the first one.
//!
//! 2. **Scintillator consistency** – candidates passing the dof and
//!    dE/dx, beta, energy windows are scored by how far their projected paddle
//!    on planes 2Y and 2X lies from the nearest fired paddle. The lowest
//!    `(y, x)` distance wins, chi2/ndof breaks ties. If nothing passes the
//!    windows, fall back to the best chi2/ndof among tracks passing the dof cut.
//!
//! 3. **Prune** – a fixed sequence of soft quality cuts. A cut is skipped when
//!    no kept candidate would survive it. The best chi2/ndof among the kept
//!    candidates wins; there is no unpruned fallback.
//!
//! Per-event scratch state lives in [`SelectionWorkspace`], which the caller
//! owns and passes in by reference.

mod prune;
mod scin;
mod sorted;
mod workspace;

pub use prune::{CutOutcome, PruneCut};
pub use scin::ScinScore;
pub use workspace::SelectionWorkspace;

use crate::calibration::CalibrationState;
use crate::config::{SelectionConfig, SelectionMethod};
use crate::hodoscope::Hodoscope;
use crate::track::{MissingCandidate, Track, TrackList};

/// Outcome of golden-track selection for one event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GoldenSelection {
    /// Index of the golden track in the (possibly re-sorted) track list.
    pub golden: Option<usize>,
    /// Strategy that produced the decision.
    pub method: SelectionMethod,
    /// Scintillator selection fell back to the dof-only chi2 scan.
    pub fallback: bool,
}

impl GoldenSelection {
    pub(crate) fn none(method: SelectionMethod) -> Self {
        Self {
            golden: None,
            method,
            fallback: false,
        }
    }
}

/// Applies the configured strategy to one event's candidates.
#[derive(Debug, Clone, Copy)]
pub struct TrackSelector<'a> {
    config: &'a SelectionConfig,
    calibration: &'a CalibrationState,
}

impl<'a> TrackSelector<'a> {
    pub fn new(config: &'a SelectionConfig, calibration: &'a CalibrationState) -> Self {
        Self {
            config,
            calibration,
        }
    }

    /// Pick at most one golden track.
    ///
    /// `workspace` is reset first; afterwards it holds the scintillator
    /// scores or prune masks of this event. Sorted-first selection may
    /// reorder `tracks`.
    pub fn select(
        &self,
        tracks: &mut dyn TrackList,
        hodo: &dyn Hodoscope,
        workspace: &mut SelectionWorkspace,
    ) -> Result<GoldenSelection, MissingCandidate> {
        workspace.reset(tracks.len());
        let selection = match self.config.method() {
            SelectionMethod::SortedFirst => sorted::select(tracks, self.config.sort_tracks)?,
            SelectionMethod::ScintillatorConsistency => {
                scin::select(&*tracks, hodo, self.config, workspace)?
            }
            SelectionMethod::Prune => prune::select(
                &*tracks,
                hodo,
                &self.config.prune,
                self.calibration,
                workspace,
            )?,
        };
        tracing::debug!(
            "golden track: {:?} of {} candidates ({:?}{})",
            selection.golden,
            tracks.len(),
            selection.method,
            if selection.fallback { ", fallback" } else { "" }
        );
        Ok(selection)
    }
}

/// Index of the smallest chi2/ndof; the earliest wins on ties.
pub(crate) fn min_chi2_per_dof<'t>(
    candidates: impl Iterator<Item = (usize, &'t Track)>,
) -> Option<usize> {
    candidates
        .map(|(i, t)| (i, t.chi2_rank()))
        .min_by(|a, b| a.1.total_cmp(&b.1))
        .map(|(i, _)| i)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::SelectionConfig;
    use crate::hodoscope::HodoscopeSnapshot;
    use crate::test_utils::good_track;

    /// Track source with empty slots.
    struct SparseTracks(Vec<Option<Track>>);

    impl TrackList for SparseTracks {
        fn len(&self) -> usize {
            self.0.len()
        }

        fn get(&self, index: usize) -> Option<&Track> {
            self.0.get(index).and_then(Option::as_ref)
        }

        fn get_mut(&mut self, index: usize) -> Option<&mut Track> {
            self.0.get_mut(index).and_then(Option::as_mut)
        }

        fn sort_by_chi2_per_dof(&mut self) {}
    }

    fn configs() -> Vec<SelectionConfig> {
        let sorted = SelectionConfig::default();
        let scin = SelectionConfig {
            sel_using_scin: true,
            ..SelectionConfig::default()
        };
        let prune = SelectionConfig {
            sel_using_prune: true,
            ..SelectionConfig::default()
        };
        vec![sorted, scin, prune]
    }

    #[test]
    fn empty_event_clears_golden_for_every_method() {
        let cal = CalibrationState::default();
        let hodo = HodoscopeSnapshot::default();
        for config in configs() {
            let mut ws = SelectionWorkspace::new();
            let mut tracks: Vec<Track> = Vec::new();
            let sel = TrackSelector::new(&config, &cal)
                .select(&mut tracks, &hodo, &mut ws)
                .expect("empty event is not an error");
            assert_eq!(sel.golden, None);
            assert_eq!(sel.method, config.method());
        }
    }

    #[test]
    fn absent_candidate_aborts_selection_for_every_method() {
        let cal = CalibrationState::default();
        let hodo = HodoscopeSnapshot::default();
        for config in configs() {
            let mut ws = SelectionWorkspace::new();
            let mut tracks = SparseTracks(vec![None, Some(good_track(1.0, 4))]);
            let err = TrackSelector::new(&config, &cal)
                .select(&mut tracks, &hodo, &mut ws)
                .expect_err("absent candidate must fail");
            assert_eq!(err.index, 0);
            assert_eq!(err.n_tracks, 2);
        }
    }

    #[test]
    fn workspace_from_previous_event_is_discarded() {
        let cal = CalibrationState::default();
        let hodo = HodoscopeSnapshot::default();
        let config = SelectionConfig {
            sel_using_prune: true,
            ..SelectionConfig::default()
        };
        let selector = TrackSelector::new(&config, &cal);
        let mut ws = SelectionWorkspace::new();

        let mut first = vec![good_track(1.0, 4), good_track(2.0, 4), good_track(3.0, 4)];
        selector.select(&mut first, &hodo, &mut ws).expect("select");
        assert_eq!(ws.reject_code(2), Some(0));

        let mut second: Vec<Track> = Vec::new();
        let sel = selector.select(&mut second, &hodo, &mut ws).expect("select");
        assert_eq!(sel.golden, None);
        assert_eq!(ws.reject_code(0), None);
        assert!(ws.cut_outcomes().is_empty());
    }

    #[test]
    fn min_chi2_prefers_earliest_on_tie() {
        let tracks = [good_track(2.0, 2), good_track(1.0, 1), good_track(3.0, 3)];
        assert_eq!(min_chi2_per_dof(tracks.iter().enumerate()), Some(0));
        assert_eq!(min_chi2_per_dof(std::iter::empty()), None);
    }
}
