//! Shared builders for unit tests.

use crate::hodoscope::{HodoscopeSnapshot, PlaneGeometry};
use crate::track::{FocalPlaneCoords, Track};

/// Track that passes every scintillator window and prune cut under default
/// thresholds, a massless particle and a zero start time.
pub(crate) fn good_track(chi2: f64, ndof: u32) -> Track {
    Track {
        dedx: 1.0,
        beta: 1.0,
        beta_chi2: 0.5,
        energy: 1.0,
        fp_time: 0.0,
        n_pmt: 8,
        good_plane3: true,
        good_plane4: true,
        momentum: 1.0,
        ..Track::new(FocalPlaneCoords::default(), chi2, ndof)
    }
}

/// [`good_track`] at focal-plane position `(x, y)` with zero slopes.
pub(crate) fn track_at(x: f64, y: f64, chi2: f64, ndof: u32) -> Track {
    let mut t = good_track(chi2, ndof);
    t.focal.x = x;
    t.focal.y = y;
    t
}

/// HMS-like hodoscope: 1X, 1Y, 2X, 2Y with realistic paddle counts.
pub(crate) fn hms_hodoscope() -> HodoscopeSnapshot {
    let x = PlaneGeometry {
        n_paddles: 16,
        center: -56.25,
        spacing: 7.5,
    };
    let y = PlaneGeometry {
        n_paddles: 10,
        center: 33.75,
        spacing: 7.5,
    };
    HodoscopeSnapshot::new(vec![x, y, x, y])
}
