use serde::{Deserialize, Serialize};

use crate::config::CalibrationConfig;
use crate::recon_table::FocalPlaneRotation;

/// Calibration constants used by the target transform and prune selection.
///
/// Built once per configuration epoch and read-only afterwards.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CalibrationState {
    /// Focal-plane rotation and detector offsets.
    pub rotation: FocalPlaneRotation,
    /// Offset added to the reconstructed x-angle (rad).
    pub phi_offset: f64,
    /// Offset added to the reconstructed y-angle (rad).
    pub theta_offset: f64,
    /// Offset added to the reconstructed delta (percent).
    pub delta_offset: f64,
    /// Detected particle mass (GeV/c^2).
    pub particle_mass: f64,
    /// Central momentum including its offset (GeV/c).
    pub p_central: f64,
    /// Central lab angle including its offset (deg).
    pub theta_lab_deg: f64,
    /// Central out-of-plane angle (deg).
    pub phi_central_deg: f64,
}

impl Default for CalibrationState {
    fn default() -> Self {
        Self {
            rotation: FocalPlaneRotation::default(),
            phi_offset: 0.0,
            theta_offset: 0.0,
            delta_offset: 0.0,
            particle_mass: 0.0,
            p_central: 1.0,
            theta_lab_deg: 0.0,
            phi_central_deg: 0.0,
        }
    }
}

impl CalibrationState {
    /// Derive the effective central kinematics from database values.
    pub fn from_config(config: &CalibrationConfig, rotation: FocalPlaneRotation) -> Self {
        Self {
            rotation,
            phi_offset: config.phi_offset,
            theta_offset: config.theta_offset,
            delta_offset: config.delta_offset,
            particle_mass: config.partmass,
            p_central: config.pcentral * (1.0 + config.pcentral_offset / 100.0),
            theta_lab_deg: config.theta_lab + config.thetacentral_offset.to_degrees(),
            phi_central_deg: config.phi_offset.to_degrees(),
        }
    }

    /// Momentum for a relative deviation given in percent.
    #[inline]
    pub fn momentum(&self, delta_percent: f64) -> f64 {
        self.p_central * (1.0 + delta_percent / 100.0)
    }

    /// Velocity expected for momentum `p` under the configured mass.
    #[inline]
    pub fn beta_for_momentum(&self, p: f64) -> f64 {
        p / (p * p + self.particle_mass * self.particle_mass).sqrt()
    }
}
