//! Focal-plane to target reconstruction.
//!
//! 1. **Transport frame** – convert focal-plane positions from cm to m, move
//!    them to the true focus and add detector/angle offsets.
//! 2. **Rotation** – first-order correction of the focal-plane frame tilt:
//!    `x' += x·ang_slope_x`, `y' += y·ang_slope_y`.
//! 3. **COSY sums** – evaluate every [`ReconTerm`](crate::ReconTerm) at the
//!    rotated vector.
//! 4. **Target frame** – scale back to cm/percent and apply offsets.
//!
//! Offset naming follows the calibration database: `phi_offset` shifts the
//! dispersive angle `xp` and `theta_offset` the non-dispersive angle `yp`.

use crate::calibration::CalibrationState;
use crate::recon_table::{FocalPlaneRotation, ReconTable, N_INPUTS};
use crate::track::{FocalPlaneCoords, TargetCoords, Track};

const CM_PER_M: f64 = 100.0;
const PERCENT: f64 = 100.0;

/// Target-frame result of one reconstruction.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TargetReconstruction {
    pub target: TargetCoords,
    /// Momentum (GeV/c).
    pub momentum: f64,
}

/// Transport-frame vector before rotation.
pub fn transport_vector(
    focal: &FocalPlaneCoords,
    raster_y_cm: f64,
    rotation: &FocalPlaneRotation,
) -> [f64; N_INPUTS] {
    [
        focal.x / CM_PER_M + rotation.z_true_focus * focal.xp + rotation.det_offset_x,
        focal.xp + rotation.ang_offset_x,
        focal.y / CM_PER_M + rotation.z_true_focus * focal.yp + rotation.det_offset_y,
        focal.yp + rotation.ang_offset_y,
        -raster_y_cm / CM_PER_M,
    ]
}

/// Apply the first-order focal-plane rotation.
pub fn rotate(hut: [f64; N_INPUTS], rotation: &FocalPlaneRotation) -> [f64; N_INPUTS] {
    let mut out = hut;
    out[1] = hut[1] + hut[0] * rotation.ang_slope_x;
    out[3] = hut[3] + hut[2] * rotation.ang_slope_y;
    out
}

/// Reconstruct target quantities for one set of focal-plane parameters.
///
/// `raster_y_cm` is the fast-raster beam position; pass `0.0` when no raster
/// correction is available.
pub fn reconstruct_target(
    focal: &FocalPlaneCoords,
    raster_y_cm: f64,
    calibration: &CalibrationState,
    table: &ReconTable,
) -> TargetReconstruction {
    let hut = transport_vector(focal, raster_y_cm, &calibration.rotation);
    let hut_rot = rotate(hut, &calibration.rotation);
    let sum = table.evaluate(&hut_rot);

    let delta = sum[3] * PERCENT + calibration.delta_offset;
    TargetReconstruction {
        target: TargetCoords {
            y: sum[1] * CM_PER_M,
            xp: sum[0] + calibration.phi_offset,
            yp: sum[2] + calibration.theta_offset,
            delta,
        },
        momentum: calibration.momentum(delta),
    }
}

/// Reconstruct and store target quantities on `track`.
pub fn apply_to_track(track: &mut Track, calibration: &CalibrationState, table: &ReconTable) {
    let r = reconstruct_target(&track.focal, 0.0, calibration, table);
    track.target = r.target;
    track.momentum = r.momentum;
}

#[cfg(test)]
mod tests {
    use approx::assert_relative_eq;
    use rand::rngs::StdRng;
    use rand::seq::SliceRandom;
    use rand::{Rng, SeedableRng};

    use super::*;
    use crate::recon_table::ReconTerm;

    fn focal(x: f64, xp: f64, y: f64, yp: f64) -> FocalPlaneCoords {
        FocalPlaneCoords { x, xp, y, yp }
    }

    #[test]
    fn single_linear_term_maps_x_to_dispersive_angle() {
        let table = ReconTable::new(vec![ReconTerm::new([1.0, 0.0, 0.0, 0.0], [1, 0, 0, 0, 0])]);
        let cal = CalibrationState::default();
        let r = reconstruct_target(&focal(2.0, 0.0, 0.0, 0.0), 0.0, &cal, &table);
        assert_eq!(r.target.xp, 2.0 / 100.0);
        assert_eq!(r.target.yp, 0.0);
        assert_eq!(r.target.y, 0.0);
        assert_eq!(r.target.delta, 0.0);
        assert_eq!(r.momentum, cal.p_central);

        let cal = CalibrationState {
            phi_offset: 0.003,
            ..CalibrationState::default()
        };
        let r = reconstruct_target(&focal(2.0, 0.0, 0.0, 0.0), 0.0, &cal, &table);
        assert_eq!(r.target.xp, 2.0 / 100.0 + 0.003);
    }

    #[test]
    fn outputs_are_scaled_and_offset() {
        let table = ReconTable::new(vec![
            ReconTerm::new([0.0, 0.5, 0.0, 0.0], [0, 0, 1, 0, 0]),
            ReconTerm::new([0.0, 0.0, 2.0, 0.0], [0, 0, 0, 1, 0]),
            ReconTerm::new([0.0, 0.0, 0.0, 0.25], [1, 0, 0, 0, 0]),
        ]);
        let cal = CalibrationState {
            theta_offset: 0.001,
            delta_offset: 0.2,
            p_central: 2.0,
            ..CalibrationState::default()
        };
        let r = reconstruct_target(&focal(40.0, 0.0, 10.0, 0.01), 0.0, &cal, &table);
        assert_relative_eq!(r.target.y, 0.5 * 0.1 * 100.0, epsilon = 1e-12);
        assert_relative_eq!(r.target.yp, 0.02 + 0.001, epsilon = 1e-12);
        assert_relative_eq!(r.target.delta, 0.25 * 0.4 * 100.0 + 0.2, epsilon = 1e-12);
        assert_relative_eq!(r.momentum, 2.0 * (1.0 + r.target.delta / 100.0), epsilon = 1e-12);
    }

    #[test]
    fn rotation_is_applied_before_evaluation() {
        let rotation = FocalPlaneRotation {
            ang_slope_x: 0.1,
            ang_slope_y: -0.2,
            z_true_focus: 0.5,
            det_offset_x: 0.01,
            ang_offset_y: 0.002,
            ..FocalPlaneRotation::default()
        };
        let hut = transport_vector(&focal(10.0, 0.01, -20.0, 0.03), 0.0, &rotation);
        assert_relative_eq!(hut[0], 0.1 + 0.005 + 0.01, epsilon = 1e-15);
        assert_relative_eq!(hut[2], -0.2 + 0.015, epsilon = 1e-15);
        assert_relative_eq!(hut[3], 0.032, epsilon = 1e-15);

        let rot = rotate(hut, &rotation);
        assert_relative_eq!(rot[1], hut[1] + hut[0] * 0.1, epsilon = 1e-15);
        assert_relative_eq!(rot[3], hut[3] - hut[2] * 0.2, epsilon = 1e-15);
        assert_eq!(rot[0], hut[0]);
        assert_eq!(rot[2], hut[2]);

        // x' term only sees the rotated slope.
        let table = ReconTable::new(vec![ReconTerm::new([1.0, 0.0, 0.0, 0.0], [0, 1, 0, 0, 0])]);
        let cal = CalibrationState {
            rotation,
            ..CalibrationState::default()
        };
        let r = reconstruct_target(&focal(10.0, 0.01, -20.0, 0.03), 0.0, &cal, &table);
        assert_relative_eq!(r.target.xp, rot[1], epsilon = 1e-15);
    }

    #[test]
    fn raster_input_enters_with_negative_sign() {
        let table = ReconTable::new(vec![ReconTerm::new([0.0, 0.0, 0.0, 1.0], [0, 0, 0, 0, 1])]);
        let cal = CalibrationState::default();
        let r = reconstruct_target(&FocalPlaneCoords::default(), 0.3, &cal, &table);
        assert_relative_eq!(r.target.delta, -0.3, epsilon = 1e-12);
    }

    #[test]
    fn zero_exponents_at_origin_contribute_constant() {
        let table = ReconTable::new(vec![ReconTerm::new([0.5, 0.0, 0.0, 0.0], [0, 0, 0, 0, 0])]);
        let r = reconstruct_target(
            &FocalPlaneCoords::default(),
            0.0,
            &CalibrationState::default(),
            &table,
        );
        assert_eq!(r.target.xp, 0.5);
    }

    #[test]
    fn reconstruction_is_deterministic_and_order_insensitive() {
        let mut rng = StdRng::seed_from_u64(17);
        let mut terms: Vec<ReconTerm> = (0..200)
            .map(|_| {
                let coeff = [
                    rng.gen_range(-1.0..1.0),
                    rng.gen_range(-1.0..1.0),
                    rng.gen_range(-1.0..1.0),
                    rng.gen_range(-1.0..1.0),
                ];
                let mut exp = [0u8; N_INPUTS];
                for e in exp.iter_mut() {
                    *e = rng.gen_range(0..4);
                }
                ReconTerm::new(coeff, exp)
            })
            .collect();
        let cal = CalibrationState::default();
        let fp = focal(12.0, 0.02, -4.0, 0.015);

        let table = ReconTable::new(terms.clone());
        let a = reconstruct_target(&fp, 0.0, &cal, &table);
        let b = reconstruct_target(&fp, 0.0, &cal, &table);
        assert_eq!(a, b);

        terms.shuffle(&mut rng);
        let shuffled = reconstruct_target(&fp, 0.0, &cal, &ReconTable::new(terms));
        assert_relative_eq!(a.target.xp, shuffled.target.xp, epsilon = 1e-12);
        assert_relative_eq!(a.target.yp, shuffled.target.yp, epsilon = 1e-12);
        assert_relative_eq!(a.target.y, shuffled.target.y, epsilon = 1e-10);
        assert_relative_eq!(a.target.delta, shuffled.target.delta, epsilon = 1e-10);
    }

    #[test]
    fn apply_to_track_writes_target_block() {
        let table = ReconTable::new(vec![ReconTerm::new([0.0, 0.0, 0.0, 0.01], [0, 0, 0, 0, 0])]);
        let cal = CalibrationState {
            p_central: 3.0,
            ..CalibrationState::default()
        };
        let mut track = Track::new(focal(1.0, 0.0, 0.0, 0.0), 1.0, 1);
        apply_to_track(&mut track, &cal, &table);
        assert_relative_eq!(track.target.delta, 1.0, epsilon = 1e-12);
        assert_relative_eq!(track.momentum, 3.03, epsilon = 1e-12);
    }
}
