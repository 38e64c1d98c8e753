//! Prune selection: sequential soft cuts.

use serde::{Deserialize, Serialize};

use super::{min_chi2_per_dof, GoldenSelection, SelectionWorkspace};
use crate::calibration::CalibrationState;
use crate::config::{PruneConfig, SelectionMethod};
use crate::hodoscope::Hodoscope;
use crate::track::{resolve_all, MissingCandidate, Track, TrackList};

/// Lower bound of the accepted time-of-flight chi-square window.
const BETA_CHI2_MIN: f64 = 0.01;

/// One prune cut. Cuts run in [`PruneCut::ORDER`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PruneCut {
    /// `|xp_tar| < xp`
    XpTar,
    /// `|yp_tar| < yp`
    YpTar,
    /// `|y_tar| < ytar`
    YTar,
    /// `|delta| < delta`
    Delta,
    /// `|beta - p/sqrt(p^2 + m^2)| < beta`
    Beta,
    /// `ndof >= df`
    Ndof,
    /// `n_pmt >= npmt`
    NPmt,
    /// `0.01 < beta_chi2 < chibeta`
    BetaChi2,
    /// `|fp_time - start_time_center| < fptime`
    FpTime,
    /// Good hit in plane 4 (2Y).
    Plane4,
    /// Good hit in plane 3 (2X).
    Plane3,
}

impl PruneCut {
    pub const ORDER: [PruneCut; 11] = [
        PruneCut::XpTar,
        PruneCut::YpTar,
        PruneCut::YTar,
        PruneCut::Delta,
        PruneCut::Beta,
        PruneCut::Ndof,
        PruneCut::NPmt,
        PruneCut::BetaChi2,
        PruneCut::FpTime,
        PruneCut::Plane4,
        PruneCut::Plane3,
    ];

    /// Code added to a track's reject sum when it fails this cut.
    pub fn reject_code(self) -> u32 {
        match self {
            Self::XpTar => 1,
            Self::YpTar => 2,
            Self::YTar => 10,
            Self::Delta => 20,
            Self::Beta => 100,
            Self::Ndof => 200,
            Self::BetaChi2 => 1_000,
            Self::FpTime => 2_000,
            Self::Plane4 => 10_000,
            Self::Plane3 => 20_000,
            Self::NPmt => 100_000,
        }
    }

    fn passes(self, track: &Track, ctx: &PruneContext<'_>) -> bool {
        let t = &ctx.thresholds;
        match self {
            Self::XpTar => track.target.xp.abs() < t.xp,
            Self::YpTar => track.target.yp.abs() < t.yp,
            Self::YTar => track.target.y.abs() < t.ytar,
            Self::Delta => track.target.delta.abs() < t.delta,
            Self::Beta => {
                (track.beta - ctx.calibration.beta_for_momentum(track.momentum)).abs() < t.beta
            }
            Self::Ndof => f64::from(track.ndof) >= t.df,
            Self::NPmt => f64::from(track.n_pmt) >= t.npmt,
            Self::BetaChi2 => track.beta_chi2 > BETA_CHI2_MIN && track.beta_chi2 < t.chibeta,
            Self::FpTime => (track.fp_time - ctx.start_time_center).abs() < t.fptime,
            Self::Plane4 => track.good_plane4,
            Self::Plane3 => track.good_plane3,
        }
    }
}

/// How one cut played out on an event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CutOutcome {
    pub cut: PruneCut,
    /// The cut removed failing candidates; false means it was skipped.
    pub applied: bool,
    /// Kept candidates that passed the cut.
    pub n_passing: usize,
}

struct PruneContext<'a> {
    thresholds: PruneConfig,
    calibration: &'a CalibrationState,
    start_time_center: f64,
}

/// Apply `cut` unless no kept candidate passes it.
///
/// When applied, every failing candidate is dropped and charged the reject
/// code, including candidates an earlier cut already dropped.
fn apply_soft_cut(
    cut: PruneCut,
    candidates: &[&Track],
    ctx: &PruneContext<'_>,
    keep: &mut [bool],
    reject: &mut [u32],
) -> CutOutcome {
    let passing: Vec<bool> = candidates.iter().map(|t| cut.passes(t, ctx)).collect();
    let n_passing = passing
        .iter()
        .zip(keep.iter())
        .filter(|&(&p, &k)| p && k)
        .count();
    let applied = n_passing > 0;
    if applied {
        for ((&p, k), r) in passing.iter().zip(keep.iter_mut()).zip(reject.iter_mut()) {
            if !p {
                *k = false;
                *r += cut.reject_code();
            }
        }
    }
    CutOutcome {
        cut,
        applied,
        n_passing,
    }
}

pub(super) fn select(
    tracks: &dyn TrackList,
    hodo: &dyn Hodoscope,
    thresholds: &PruneConfig,
    calibration: &CalibrationState,
    ws: &mut SelectionWorkspace,
) -> Result<GoldenSelection, MissingCandidate> {
    let method = SelectionMethod::Prune;
    let candidates = resolve_all(tracks)?;
    if candidates.is_empty() {
        return Ok(GoldenSelection::none(method));
    }

    let ctx = PruneContext {
        thresholds: thresholds.normalized(),
        calibration,
        start_time_center: hodo.start_time_center(),
    };
    ws.keep = vec![true; candidates.len()];
    ws.reject = vec![0; candidates.len()];

    for cut in PruneCut::ORDER {
        let outcome = apply_soft_cut(cut, &candidates, &ctx, &mut ws.keep, &mut ws.reject);
        if outcome.applied {
            tracing::trace!("prune {:?}: {} candidates kept", cut, outcome.n_passing);
        } else {
            tracing::trace!("prune {:?}: no kept candidate passes, cut skipped", cut);
        }
        ws.cut_log.push(outcome);
    }

    let keep = &ws.keep;
    let golden = min_chi2_per_dof(
        candidates
            .iter()
            .enumerate()
            .filter(|&(i, _)| keep[i])
            .map(|(i, t)| (i, *t)),
    );
    Ok(GoldenSelection {
        golden,
        method,
        fallback: false,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hodoscope::HodoscopeSnapshot;
    use crate::test_utils::good_track;

    fn run(tracks: &[Track], thresholds: &PruneConfig) -> (GoldenSelection, SelectionWorkspace) {
        run_with(tracks, thresholds, &HodoscopeSnapshot::default())
    }

    fn run_with(
        tracks: &[Track],
        thresholds: &PruneConfig,
        hodo: &HodoscopeSnapshot,
    ) -> (GoldenSelection, SelectionWorkspace) {
        let cal = CalibrationState::default();
        let mut ws = SelectionWorkspace::new();
        ws.reset(tracks.len());
        let tracks = tracks.to_vec();
        let sel = select(&tracks, hodo, thresholds, &cal, &mut ws).expect("select");
        (sel, ws)
    }

    #[test]
    fn reject_codes_are_distinct_digits() {
        let mut codes: Vec<u32> = PruneCut::ORDER.iter().map(|c| c.reject_code()).collect();
        codes.sort_unstable();
        codes.dedup();
        assert_eq!(codes.len(), PruneCut::ORDER.len());
        assert_eq!(PruneCut::ORDER[0], PruneCut::XpTar);
        assert_eq!(PruneCut::ORDER[10], PruneCut::Plane3);
    }

    #[test]
    fn clean_event_picks_lowest_chi2() {
        let tracks = [good_track(6.0, 3), good_track(1.5, 3), good_track(2.0, 2)];
        let (sel, ws) = run(&tracks, &PruneConfig::default());
        assert_eq!(sel.golden, Some(1));
        assert!(ws.cut_outcomes().iter().all(|o| o.applied && o.n_passing == 3));
        assert_eq!(ws.cut_outcomes().len(), PruneCut::ORDER.len());
    }

    #[test]
    fn cut_with_no_survivors_is_skipped() {
        let mut wide = good_track(1.0, 4);
        wide.target.xp = 0.5;
        wide.target.yp = 0.5;
        let mut narrow = good_track(9.0, 4);
        narrow.target.yp = 0.5;

        let (sel, ws) = run(&[wide, narrow], &PruneConfig::default());
        assert_eq!(sel.golden, Some(1));

        let log = ws.cut_outcomes();
        assert_eq!(log[0].cut, PruneCut::XpTar);
        assert!(log[0].applied);
        assert_eq!(log[0].n_passing, 1);
        assert_eq!(log[1].cut, PruneCut::YpTar);
        assert!(!log[1].applied);

        assert_eq!(ws.is_kept(0), Some(false));
        assert_eq!(ws.is_kept(1), Some(true));
        assert_eq!(ws.reject_code(0), Some(1));
        assert_eq!(ws.reject_code(1), Some(0));
    }

    #[test]
    fn dropped_tracks_keep_accumulating_codes() {
        let mut bad = good_track(0.5, 4);
        bad.target.xp = 0.2;
        bad.target.y = 6.0;
        bad.good_plane3 = false;
        let (sel, ws) = run(&[bad, good_track(4.0, 4)], &PruneConfig::default());
        assert_eq!(sel.golden, Some(1));
        assert_eq!(ws.reject_code(0), Some(1 + 10 + 20_000));
    }

    #[test]
    fn thresholds_below_floor_are_raised() {
        let mut t = good_track(1.0, 4);
        t.target.xp = 0.05;
        let strict = PruneConfig {
            xp: 0.01,
            ..PruneConfig::default()
        };
        let (sel, ws) = run(&[t, good_track(5.0, 4)], &strict);
        assert_eq!(sel.golden, Some(0));
        assert_eq!(ws.reject_code(0), Some(0));
    }

    #[test]
    fn beta_is_compared_with_momentum_expectation() {
        let mut slow = good_track(1.0, 4);
        slow.beta = 0.7;
        let (sel, ws) = run(&[slow, good_track(3.0, 4)], &PruneConfig::default());
        assert_eq!(sel.golden, Some(1));
        assert_eq!(ws.reject_code(0), Some(PruneCut::Beta.reject_code()));
    }

    #[test]
    fn focal_time_is_relative_to_start_time() {
        let hodo = HodoscopeSnapshot {
            start_time_center: 30.0,
            ..HodoscopeSnapshot::default()
        };
        let mut early = good_track(1.0, 4);
        early.fp_time = 0.0;
        let mut on_time = good_track(8.0, 4);
        on_time.fp_time = 32.0;
        let (sel, ws) = run_with(&[early, on_time], &PruneConfig::default(), &hodo);
        assert_eq!(sel.golden, Some(1));
        assert_eq!(ws.reject_code(0), Some(2_000));
    }

    #[test]
    fn beta_chi2_window_is_open() {
        let mut zero = good_track(1.0, 4);
        zero.beta_chi2 = 0.01;
        let (sel, ws) = run(&[zero, good_track(2.0, 4)], &PruneConfig::default());
        assert_eq!(sel.golden, Some(1));
        assert_eq!(ws.reject_code(0), Some(1_000));
    }

    #[test]
    fn single_failing_track_survives_every_cut() {
        let mut t = good_track(1.0, 0);
        t.target.delta = 40.0;
        t.n_pmt = 0;
        let (sel, ws) = run(&[t], &PruneConfig::default());
        assert_eq!(sel.golden, Some(0));
        assert_eq!(ws.reject_code(0), Some(0));
        assert!(!ws.cut_outcomes()[3].applied);
    }
}
