//! hallc-recon — target reconstruction and golden-track selection for the
//! Hall C magnetic spectrometers.
//!
//! Per event the stages are:
//!
//! 1. **Transform** – map every candidate's focal-plane parameters to target
//!    quantities (angles, y, delta, momentum) through a COSY-style polynomial
//!    coefficient table.
//! 2. **Select** – choose at most one golden track: sorted-first,
//!    scintillator-consistency or prune, picked by configuration.
//! 3. **Timing** – post-selection timing refinement hook.
//!
//! # Public API
//! - [`Spectrometer`] as the primary entry point
//! - [`SpectrometerConfig`] and its sections for tuning
//! - [`TrackList`] and [`Hodoscope`] collaborator traits
//! - [`ReconTable`] and the transform functions for standalone use

mod calibration;
mod config;
mod hodoscope;
mod recon_table;
mod selector;
mod spectrometer;
mod timing;
mod track;
pub mod transform;

#[cfg(test)]
mod test_utils;

pub use calibration::CalibrationState;
pub use config::{
    CalibrationConfig, ConfigError, PruneConfig, ScinSelectConfig, SelectionConfig,
    SelectionMethod, SpectrometerConfig,
};
pub use hodoscope::{Hodoscope, HodoscopeSnapshot, PlaneGeometry, PLANE_2X, PLANE_2Y};
pub use recon_table::{
    FocalPlaneRotation, ReconTable, ReconTableError, ReconTerm, TableBlock, N_INPUTS, N_OUTPUTS,
};
pub use selector::{
    CutOutcome, GoldenSelection, PruneCut, ScinScore, SelectionWorkspace, TrackSelector,
};
pub use spectrometer::{EventError, EventReconstruction, InitError, Spectrometer};
pub use timing::{NoTimingRefinement, TimingError, TimingRefinement};
pub use track::{FocalPlaneCoords, MissingCandidate, TargetCoords, Track, TrackList};
pub use transform::TargetReconstruction;
