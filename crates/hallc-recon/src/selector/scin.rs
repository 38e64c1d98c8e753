//! Scintillator-consistency selection.
//!
//! Each candidate is projected to the 2Y and 2X hodoscope planes and the
//! projected position is converted to a one-based paddle number:
//!
//! ```text
//! 2Y: n = round((center - y_hit) / spacing) + 1
//! 2X: n = round((x_hit - center) / spacing) + 1
//! ```
//!
//! where `round` is half-to-even and `n` is clamped to `1..=n_paddles`. The
//! score is the distance from `n` to the nearest fired paddle of that plane.

use serde::{Deserialize, Serialize};

use super::{min_chi2_per_dof, GoldenSelection, SelectionWorkspace};
use crate::config::{ScinSelectConfig, SelectionConfig, SelectionMethod};
use crate::hodoscope::{Hodoscope, PLANE_2X, PLANE_2Y};
use crate::track::{resolve_all, MissingCandidate, Track, TrackList};

/// Paddle distances of one candidate.
///
/// Ordering is lexicographic with the 2Y distance first.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
pub struct ScinScore {
    /// Distance on plane 2Y (paddles).
    pub y_dist: u32,
    /// Distance on plane 2X (paddles).
    pub x_dist: u32,
}

/// Fired-paddle flags of the two scoring planes.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
struct PaddleHits {
    x: Vec<bool>,
    y: Vec<bool>,
}

impl PaddleHits {
    /// Walk the flat hit list plane by plane, keeping hits of 2X and 2Y.
    fn collect(hodo: &dyn Hodoscope, n_planes: usize) -> Self {
        let mut hits = Self {
            x: vec![false; hodo.n_paddles(PLANE_2X)],
            y: vec![false; hodo.n_paddles(PLANE_2Y)],
        };
        let mut raw_index = 0;
        for plane in 0..n_planes {
            let mask = match plane {
                PLANE_2X => Some(hits.x.as_mut_slice()),
                PLANE_2Y => Some(hits.y.as_mut_slice()),
                _ => None,
            };
            raw_index = mark_plane_hits(hodo, plane, raw_index, mask);
        }
        hits
    }
}

/// Mark the hits of `plane` starting at `first_raw_index` in the flat list.
///
/// Returns the flat index of the next plane's first hit.
fn mark_plane_hits(
    hodo: &dyn Hodoscope,
    plane: usize,
    first_raw_index: usize,
    mask: Option<&mut [bool]>,
) -> usize {
    let end = first_raw_index + hodo.n_hits(plane);
    let Some(mask) = mask else {
        return end;
    };
    for raw_index in first_raw_index..end {
        match hodo.hit_paddle(raw_index) {
            Some(paddle) if paddle < mask.len() => mask[paddle] = true,
            Some(paddle) => tracing::warn!(
                "plane {} hit on paddle {} outside 0..{}, ignored",
                plane,
                paddle,
                mask.len()
            ),
            None => tracing::warn!(
                "plane {} hit {} missing from hodoscope hit list, ignored",
                plane,
                raw_index
            ),
        }
    }
    end
}

/// One-based paddle number for an offset measured in paddle pitches.
fn predicted_paddle(offset_in_pitches: f64, n_paddles: usize) -> usize {
    let n_max = n_paddles.max(1);
    let counter = offset_in_pitches.round_ties_even() + 1.0;
    if counter.is_nan() || counter <= 1.0 {
        1
    } else if counter >= n_max as f64 {
        n_max
    } else {
        counter as usize
    }
}

/// Distance from one-based `paddle` to the nearest fired paddle; 0 when none fired.
fn nearest_hit_distance(paddle: usize, fired: &[bool]) -> u32 {
    fired
        .iter()
        .enumerate()
        .filter(|&(_, &hit)| hit)
        .map(|(i, _)| paddle.abs_diff(i + 1))
        .min()
        .map_or(0, |d| u32::try_from(d).unwrap_or(u32::MAX))
}

fn score(
    track: &Track,
    hodo: &dyn Hodoscope,
    cfg: &ScinSelectConfig,
    hits: &PaddleHits,
) -> ScinScore {
    let fp = &track.focal;

    let y_hit = fp.y + fp.yp * (cfg.scin_2y_zpos + 0.5 * cfg.scin_2y_dzpos);
    let y_paddle = predicted_paddle(
        (hodo.plane_center(PLANE_2Y) - y_hit) / hodo.plane_spacing(PLANE_2Y),
        hodo.n_paddles(PLANE_2Y),
    );

    let x_hit = fp.x + fp.xp * (cfg.scin_2x_zpos + 0.5 * cfg.scin_2x_dzpos);
    let x_paddle = predicted_paddle(
        (x_hit - hodo.plane_center(PLANE_2X)) / hodo.plane_spacing(PLANE_2X),
        hodo.n_paddles(PLANE_2X),
    );

    ScinScore {
        y_dist: nearest_hit_distance(y_paddle, &hits.y),
        x_dist: nearest_hit_distance(x_paddle, &hits.x),
    }
}

#[inline]
fn passes_ndof(track: &Track, cfg: &ScinSelectConfig) -> bool {
    f64::from(track.ndof) > cfg.ndegrees_min
}

#[inline]
fn in_open_range(v: f64, lo: f64, hi: f64) -> bool {
    v > lo && v < hi
}

fn passes_windows(track: &Track, cfg: &ScinSelectConfig) -> bool {
    in_open_range(track.dedx, cfg.dedx_min, cfg.dedx_max)
        && in_open_range(track.beta, cfg.beta_min, cfg.beta_max)
        && in_open_range(track.energy, cfg.energy_min, cfg.energy_max)
}

pub(super) fn select(
    tracks: &dyn TrackList,
    hodo: &dyn Hodoscope,
    config: &SelectionConfig,
    ws: &mut SelectionWorkspace,
) -> Result<GoldenSelection, MissingCandidate> {
    let method = SelectionMethod::ScintillatorConsistency;
    let cfg = &config.scin;
    let candidates = resolve_all(tracks)?;
    if candidates.is_empty() {
        return Ok(GoldenSelection::none(method));
    }

    // A lone candidate is golden on the windows alone.
    let hits = if candidates.len() > 1 {
        PaddleHits::collect(hodo, config.hodo_num_planes)
    } else {
        PaddleHits::default()
    };

    let mut best: Option<(ScinScore, f64, usize)> = None;
    for (i, track) in candidates.iter().enumerate() {
        if !passes_ndof(track, cfg) || !passes_windows(track, cfg) {
            continue;
        }
        let s = if candidates.len() > 1 {
            score(track, hodo, cfg, &hits)
        } else {
            ScinScore::default()
        };
        ws.scin_scores[i] = Some(s);
        let chi2 = track.chi2_rank();
        let better = match best {
            None => true,
            Some((best_s, best_chi2, _)) => s < best_s || (s == best_s && chi2 < best_chi2),
        };
        if better {
            best = Some((s, chi2, i));
        }
    }

    if let Some((s, _, i)) = best {
        tracing::trace!(
            "scintillator selection: track {} with paddle distances y={} x={}",
            i,
            s.y_dist,
            s.x_dist
        );
        return Ok(GoldenSelection {
            golden: Some(i),
            method,
            fallback: false,
        });
    }

    let golden = min_chi2_per_dof(
        candidates
            .iter()
            .enumerate()
            .filter(|(_, t)| passes_ndof(t, cfg))
            .map(|(i, t)| (i, *t)),
    );
    Ok(GoldenSelection {
        golden,
        method,
        fallback: true,
    })
}
