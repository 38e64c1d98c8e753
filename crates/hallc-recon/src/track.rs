//! Candidate tracks and the per-event track list.

use serde::{Deserialize, Serialize};

/// Track parameters at the focal plane, in detector units.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct FocalPlaneCoords {
    /// Dispersive position (cm).
    pub x: f64,
    /// Dispersive slope dx/dz (rad).
    pub xp: f64,
    /// Non-dispersive position (cm).
    pub y: f64,
    /// Non-dispersive slope dy/dz (rad).
    pub yp: f64,
}

/// Reconstructed track parameters at the target.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct TargetCoords {
    /// Non-dispersive position (cm).
    pub y: f64,
    /// Dispersive angle dx/dz (rad).
    pub xp: f64,
    /// Non-dispersive angle dy/dz (rad).
    pub yp: f64,
    /// Relative momentum deviation from the central momentum (percent).
    pub delta: f64,
}

/// One candidate track from the tracking stage.
///
/// Fit quality and hodoscope-derived quantities are filled upstream; the
/// target block and momentum are written by reconstruction.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Track {
    pub focal: FocalPlaneCoords,
    /// Track fit chi-square.
    pub chi2: f64,
    /// Track fit degrees of freedom.
    pub ndof: u32,
    /// Energy loss rate in the hodoscope.
    #[serde(default)]
    pub dedx: f64,
    /// Time-of-flight velocity.
    #[serde(default)]
    pub beta: f64,
    /// Chi-square of the time-of-flight fit.
    #[serde(default)]
    pub beta_chi2: f64,
    /// Calorimeter energy associated with the track.
    #[serde(default)]
    pub energy: f64,
    /// Focal-plane time (ns).
    #[serde(default)]
    pub fp_time: f64,
    /// Number of hodoscope PMTs on the track.
    #[serde(default)]
    pub n_pmt: u32,
    /// Track has a good hit in plane 3 (2X).
    #[serde(default)]
    pub good_plane3: bool,
    /// Track has a good hit in plane 4 (2Y).
    #[serde(default)]
    pub good_plane4: bool,
    #[serde(default)]
    pub target: TargetCoords,
    /// Reconstructed momentum (GeV/c).
    #[serde(default)]
    pub momentum: f64,
}

impl Track {
    /// Create a track with focal-plane parameters and fit quality only.
    pub fn new(focal: FocalPlaneCoords, chi2: f64, ndof: u32) -> Self {
        Self {
            focal,
            chi2,
            ndof,
            ..Self::default()
        }
    }

    /// Reduced chi-square. Infinite or NaN when `ndof == 0`.
    #[inline]
    pub fn chi2_per_dof(&self) -> f64 {
        self.chi2 / f64::from(self.ndof)
    }

    /// Ordering key for chi-square comparisons; NaN ranks with +inf.
    #[inline]
    pub(crate) fn chi2_rank(&self) -> f64 {
        let v = self.chi2_per_dof();
        if v.is_nan() {
            f64::INFINITY
        } else {
            v
        }
    }
}

/// A candidate index that did not resolve to a track.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MissingCandidate {
    pub index: usize,
    pub n_tracks: usize,
}

impl std::fmt::Display for MissingCandidate {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "candidate {} of {} is absent from the track list",
            self.index, self.n_tracks
        )
    }
}

impl std::error::Error for MissingCandidate {}

/// Ordered, indexable, mutable collection of candidate tracks.
///
/// `get`/`get_mut` may return `None` for an index below `len()` when the
/// source holds an empty slot; reconstruction treats that as a data error.
pub trait TrackList {
    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn get(&self, index: usize) -> Option<&Track>;

    fn get_mut(&mut self, index: usize) -> Option<&mut Track>;

    /// Stable in-place sort by ascending chi-square per degree of freedom.
    fn sort_by_chi2_per_dof(&mut self);
}

impl TrackList for [Track] {
    fn len(&self) -> usize {
        <[Track]>::len(self)
    }

    fn get(&self, index: usize) -> Option<&Track> {
        <[Track]>::get(self, index)
    }

    fn get_mut(&mut self, index: usize) -> Option<&mut Track> {
        <[Track]>::get_mut(self, index)
    }

    fn sort_by_chi2_per_dof(&mut self) {
        self.sort_by(|a, b| a.chi2_rank().total_cmp(&b.chi2_rank()));
    }
}

impl TrackList for Vec<Track> {
    fn len(&self) -> usize {
        self.as_slice().len()
    }

    fn get(&self, index: usize) -> Option<&Track> {
        self.as_slice().get(index)
    }

    fn get_mut(&mut self, index: usize) -> Option<&mut Track> {
        self.as_mut_slice().get_mut(index)
    }

    fn sort_by_chi2_per_dof(&mut self) {
        TrackList::sort_by_chi2_per_dof(self.as_mut_slice());
    }
}

/// Resolve `index` or report it as missing.
pub(crate) fn candidate(tracks: &dyn TrackList, index: usize) -> Result<&Track, MissingCandidate> {
    tracks.get(index).ok_or(MissingCandidate {
        index,
        n_tracks: tracks.len(),
    })
}

/// Resolve every candidate in order, failing on the first absent entry.
pub(crate) fn resolve_all(tracks: &dyn TrackList) -> Result<Vec<&Track>, MissingCandidate> {
    (0..tracks.len()).map(|i| candidate(tracks, i)).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn track(chi2: f64, ndof: u32) -> Track {
        Track::new(FocalPlaneCoords::default(), chi2, ndof)
    }

    #[test]
    fn sort_is_stable_and_ascending() {
        let mut tracks = vec![track(4.0, 2), track(1.0, 1), track(2.0, 1), track(6.0, 3)];
        tracks.sort_by_chi2_per_dof();
        let order: Vec<f64> = tracks.iter().map(|t| t.chi2).collect();
        // 4/2 and 2/1 and 6/3 tie at 2.0; input order among them is kept.
        assert_eq!(order, vec![1.0, 4.0, 2.0, 6.0]);
    }

    #[test]
    fn zero_ndof_sorts_last() {
        let mut tracks = vec![track(1.0, 0), track(5.0, 1)];
        tracks.sort_by_chi2_per_dof();
        assert_eq!(tracks[0].chi2, 5.0);

        let mut tracks = vec![track(0.0, 0), track(5.0, 1)];
        tracks.sort_by_chi2_per_dof();
        assert_eq!(tracks[0].chi2, 5.0);
    }

    #[test]
    fn missing_candidate_is_reported_with_index() {
        let tracks: Vec<Track> = vec![track(1.0, 1)];
        let err = candidate(&tracks, 3).expect_err("expected missing");
        assert_eq!(err, MissingCandidate { index: 3, n_tracks: 1 });
        assert!(err.to_string().contains("candidate 3 of 1"));
    }
}
