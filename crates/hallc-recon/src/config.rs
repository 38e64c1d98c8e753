//! Spectrometer configuration.
//!
//! Every section deserializes from JSON with per-field defaults, so a
//! configuration file only needs the keys it overrides.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

// ── Error type ─────────────────────────────────────────────────────────────

/// Errors raised while loading or validating a configuration.
#[derive(Debug)]
pub enum ConfigError {
    /// The configuration file could not be read.
    Io(std::io::Error),
    /// The configuration file is not valid JSON for this schema.
    Parse(serde_json::Error),
    /// A value is outside its allowed domain.
    Invalid(String),
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Io(e) => write!(f, "cannot read configuration: {}", e),
            Self::Parse(e) => write!(f, "malformed configuration: {}", e),
            Self::Invalid(msg) => write!(f, "invalid configuration: {}", msg),
        }
    }
}

impl std::error::Error for ConfigError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Io(e) => Some(e),
            Self::Parse(e) => Some(e),
            Self::Invalid(_) => None,
        }
    }
}

impl From<std::io::Error> for ConfigError {
    fn from(e: std::io::Error) -> Self {
        Self::Io(e)
    }
}

impl From<serde_json::Error> for ConfigError {
    fn from(e: serde_json::Error) -> Self {
        Self::Parse(e)
    }
}

// ── Sections ───────────────────────────────────────────────────────────────

/// Kinematic offsets and central settings from the parameter database.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct CalibrationConfig {
    /// Offset added to the reconstructed y-angle (rad).
    pub theta_offset: f64,
    /// Offset added to the reconstructed x-angle (rad).
    pub phi_offset: f64,
    /// Offset added to the reconstructed delta (percent).
    pub delta_offset: f64,
    /// Correction to the central lab angle (rad).
    pub thetacentral_offset: f64,
    /// Correction to the central momentum (percent).
    pub pcentral_offset: f64,
    /// Nominal central momentum (GeV/c).
    pub pcentral: f64,
    /// Nominal central lab angle (deg).
    pub theta_lab: f64,
    /// Mass of the detected particle (GeV/c^2).
    pub partmass: f64,
}

impl Default for CalibrationConfig {
    fn default() -> Self {
        Self {
            theta_offset: 0.0,
            phi_offset: 0.0,
            delta_offset: 0.0,
            thetacentral_offset: 0.0,
            pcentral_offset: 0.0,
            pcentral: 1.0,
            theta_lab: 0.0,
            partmass: 0.000_510_998_95,
        }
    }
}

/// Thresholds for scintillator-consistency selection.
///
/// All range cuts are open intervals; the degrees-of-freedom cut is strict.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ScinSelectConfig {
    /// Tracks need strictly more degrees of freedom than this.
    pub ndegrees_min: f64,
    pub dedx_min: f64,
    pub dedx_max: f64,
    pub beta_min: f64,
    pub beta_max: f64,
    pub energy_min: f64,
    pub energy_max: f64,
    /// z position of the 2X plane relative to the focal plane (cm).
    pub scin_2x_zpos: f64,
    /// Paddle staggering of the 2X plane (cm).
    pub scin_2x_dzpos: f64,
    /// z position of the 2Y plane relative to the focal plane (cm).
    pub scin_2y_zpos: f64,
    /// Paddle staggering of the 2Y plane (cm).
    pub scin_2y_dzpos: f64,
}

impl Default for ScinSelectConfig {
    fn default() -> Self {
        Self {
            ndegrees_min: 1.0,
            dedx_min: 0.0,
            dedx_max: 100.0,
            beta_min: 0.1,
            beta_max: 1.5,
            energy_min: 0.0,
            energy_max: 100.0,
            scin_2x_zpos: 318.0,
            scin_2x_dzpos: 2.12,
            scin_2y_zpos: 338.69,
            scin_2y_dzpos: 2.12,
        }
    }
}

impl ScinSelectConfig {
    fn validate(&self) -> Result<(), ConfigError> {
        let values = [
            ("ndegrees_min", self.ndegrees_min),
            ("dedx_min", self.dedx_min),
            ("dedx_max", self.dedx_max),
            ("beta_min", self.beta_min),
            ("beta_max", self.beta_max),
            ("energy_min", self.energy_min),
            ("energy_max", self.energy_max),
            ("scin_2x_zpos", self.scin_2x_zpos),
            ("scin_2x_dzpos", self.scin_2x_dzpos),
            ("scin_2y_zpos", self.scin_2y_zpos),
            ("scin_2y_dzpos", self.scin_2y_dzpos),
        ];
        for (name, v) in values {
            if !v.is_finite() {
                return Err(ConfigError::Invalid(format!(
                    "selection.scin.{} must be finite",
                    name
                )));
            }
        }
        Ok(())
    }
}

/// Thresholds for prune selection.
///
/// Use [`PruneConfig::normalized`] before applying: each threshold is raised
/// to its floor so a mis-set value cannot tighten a cut past a safe minimum.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct PruneConfig {
    /// Maximum |x-angle| at the target (rad).
    pub xp: f64,
    /// Maximum |y-angle| at the target (rad).
    pub yp: f64,
    /// Maximum |y| at the target (cm).
    pub ytar: f64,
    /// Maximum |delta| (percent).
    pub delta: f64,
    /// Maximum |beta - beta(p)|.
    pub beta: f64,
    /// Minimum track degrees of freedom.
    pub df: f64,
    /// Maximum time-of-flight chi-square.
    pub chibeta: f64,
    /// Maximum |focal-plane time - start time| (ns).
    pub fptime: f64,
    /// Minimum PMT hit count.
    pub npmt: f64,
}

impl PruneConfig {
    /// Lowest value each threshold may take.
    pub const FLOORS: PruneConfig = PruneConfig {
        xp: 0.08,
        yp: 0.04,
        ytar: 4.0,
        delta: 13.0,
        beta: 0.1,
        df: 1.0,
        chibeta: 2.0,
        fptime: 5.0,
        npmt: 6.0,
    };

    /// Return a copy with every threshold raised to at least its floor.
    ///
    /// Non-finite values fall back to the floor.
    pub fn normalized(self) -> Self {
        let f = Self::FLOORS;
        Self {
            xp: f.xp.max(self.xp),
            yp: f.yp.max(self.yp),
            ytar: f.ytar.max(self.ytar),
            delta: f.delta.max(self.delta),
            beta: f.beta.max(self.beta),
            df: f.df.max(self.df),
            chibeta: f.chibeta.max(self.chibeta),
            fptime: f.fptime.max(self.fptime),
            npmt: f.npmt.max(self.npmt),
        }
    }
}

impl Default for PruneConfig {
    fn default() -> Self {
        Self::FLOORS
    }
}

/// Golden-track decision procedure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SelectionMethod {
    /// Optionally sort by chi2/ndof, take the first track.
    SortedFirst,
    /// Hodoscope paddle consistency, then chi2/ndof.
    ScintillatorConsistency,
    /// Sequential soft quality cuts, then chi2/ndof.
    Prune,
}

/// Golden-track selection settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SelectionConfig {
    /// Sort candidates by chi2/ndof before sorted-first selection.
    pub sort_tracks: bool,
    /// Enable scintillator-consistency selection.
    pub sel_using_scin: bool,
    /// Enable prune selection. Takes precedence over `sel_using_scin`.
    pub sel_using_prune: bool,
    /// Number of hodoscope planes walked when collecting hits.
    pub hodo_num_planes: usize,
    pub scin: ScinSelectConfig,
    pub prune: PruneConfig,
}

impl Default for SelectionConfig {
    fn default() -> Self {
        Self {
            sort_tracks: true,
            sel_using_scin: false,
            sel_using_prune: false,
            hodo_num_planes: 4,
            scin: ScinSelectConfig::default(),
            prune: PruneConfig::default(),
        }
    }
}

impl SelectionConfig {
    /// Resolve the enable flags into one method.
    pub fn method(&self) -> SelectionMethod {
        if self.sel_using_prune {
            SelectionMethod::Prune
        } else if self.sel_using_scin {
            SelectionMethod::ScintillatorConsistency
        } else {
            SelectionMethod::SortedFirst
        }
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.method() == SelectionMethod::ScintillatorConsistency {
            let needed = crate::hodoscope::PLANE_2Y + 1;
            if self.hodo_num_planes < needed {
                return Err(ConfigError::Invalid(format!(
                    "scintillator selection needs hodo_num_planes >= {} (got {})",
                    needed, self.hodo_num_planes
                )));
            }
        }
        self.scin.validate()
    }
}

/// Top-level configuration for one spectrometer arm.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SpectrometerConfig {
    /// Spectrometer name used in log messages.
    pub name: String,
    /// Path of the reconstruction coefficient file.
    ///
    /// Relative paths are resolved against the configuration file directory
    /// by [`SpectrometerConfig::from_json_file`].
    pub recon_coeff_filename: PathBuf,
    pub calibration: CalibrationConfig,
    pub selection: SelectionConfig,
}

impl Default for SpectrometerConfig {
    fn default() -> Self {
        Self {
            name: "hms".to_string(),
            recon_coeff_filename: PathBuf::from("hms_recon_coeff.dat"),
            calibration: CalibrationConfig::default(),
            selection: SelectionConfig::default(),
        }
    }
}

impl SpectrometerConfig {
    /// Parse and validate a configuration from a JSON string.
    pub fn from_json_str(data: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_json::from_str(data)?;
        config.validate()?;
        Ok(config)
    }

    /// Load and validate a configuration from a JSON file.
    pub fn from_json_file(path: &Path) -> Result<Self, ConfigError> {
        let data = std::fs::read_to_string(path)?;
        let mut config = Self::from_json_str(&data)?;
        if config.recon_coeff_filename.is_relative() {
            if let Some(dir) = path.parent() {
                config.recon_coeff_filename = dir.join(&config.recon_coeff_filename);
            }
        }
        Ok(config)
    }

    /// Check value domains.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.name.trim().is_empty() {
            return Err(ConfigError::Invalid("name must not be empty".to_string()));
        }
        if self.recon_coeff_filename.as_os_str().is_empty() {
            return Err(ConfigError::Invalid(
                "recon_coeff_filename must not be empty".to_string(),
            ));
        }
        let cal = &self.calibration;
        if !cal.pcentral.is_finite() || cal.pcentral <= 0.0 {
            return Err(ConfigError::Invalid(
                "calibration.pcentral must be finite and > 0".to_string(),
            ));
        }
        if !cal.partmass.is_finite() || cal.partmass < 0.0 {
            return Err(ConfigError::Invalid(
                "calibration.partmass must be finite and >= 0".to_string(),
            ));
        }
        self.selection.validate()
    }
}
