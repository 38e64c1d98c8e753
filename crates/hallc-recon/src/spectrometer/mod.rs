//! High-level reconstruction API.
//!
//! [`Spectrometer`] owns the coefficient table, calibration and selection
//! settings of one spectrometer arm. Create once, reconstruct many events.

use std::path::{Path, PathBuf};

use crate::calibration::CalibrationState;
use crate::config::{ConfigError, SelectionConfig, SelectionMethod, SpectrometerConfig};
use crate::hodoscope::Hodoscope;
use crate::recon_table::{ReconTable, ReconTableError};
use crate::selector::{GoldenSelection, SelectionWorkspace, TrackSelector};
use crate::timing::{NoTimingRefinement, TimingError, TimingRefinement};
use crate::track::{MissingCandidate, TrackList};
use crate::transform;

// ── Error types ────────────────────────────────────────────────────────────

/// Errors that prevent a spectrometer from being built.
#[derive(Debug)]
pub enum InitError {
    Config(ConfigError),
    ReconTable {
        path: PathBuf,
        source: ReconTableError,
    },
}

impl std::fmt::Display for InitError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Config(e) => write!(f, "{}", e),
            Self::ReconTable { path, source } => {
                write!(f, "{}: {}", path.display(), source)
            }
        }
    }
}

impl std::error::Error for InitError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Config(e) => Some(e),
            Self::ReconTable { source, .. } => Some(source),
        }
    }
}

impl From<ConfigError> for InitError {
    fn from(e: ConfigError) -> Self {
        Self::Config(e)
    }
}

/// Errors that abort processing of one event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EventError {
    MissingCandidate(MissingCandidate),
    Timing(TimingError),
}

impl std::fmt::Display for EventError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::MissingCandidate(e) => write!(f, "{}", e),
            Self::Timing(e) => write!(f, "{}", e),
        }
    }
}

impl std::error::Error for EventError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::MissingCandidate(e) => Some(e),
            Self::Timing(e) => Some(e),
        }
    }
}

impl From<MissingCandidate> for EventError {
    fn from(e: MissingCandidate) -> Self {
        Self::MissingCandidate(e)
    }
}

impl From<TimingError> for EventError {
    fn from(e: TimingError) -> Self {
        Self::Timing(e)
    }
}

// ── Spectrometer ───────────────────────────────────────────────────────────

/// Result of [`Spectrometer::reconstruct`].
#[derive(Debug, Clone)]
pub struct EventReconstruction {
    pub selection: GoldenSelection,
    /// Selection scratch state of this event (scores, prune masks).
    pub workspace: SelectionWorkspace,
}

/// Target reconstruction and golden-track selection for one arm.
///
/// Immutable after construction; share it by reference across threads and
/// give each thread its own [`SelectionWorkspace`].
///
/// # Examples
///
/// ```no_run
/// use hallc_recon::{HodoscopeSnapshot, SelectionWorkspace, Spectrometer, Track};
/// use std::path::Path;
///
/// let spectrometer = Spectrometer::from_json_file(Path::new("hms.json")).unwrap();
/// let mut ws = SelectionWorkspace::new();
/// let mut tracks: Vec<Track> = Vec::new();
/// let hodo = HodoscopeSnapshot::default();
/// let selection = spectrometer
///     .reconstruct_event(&mut tracks, &hodo, &mut ws)
///     .unwrap();
/// println!("golden: {:?}", selection.golden);
/// ```
pub struct Spectrometer {
    name: String,
    table: ReconTable,
    calibration: CalibrationState,
    selection: SelectionConfig,
    timing: Box<dyn TimingRefinement + Send + Sync>,
}

impl std::fmt::Debug for Spectrometer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Spectrometer")
            .field("name", &self.name)
            .field("n_terms", &self.table.len())
            .field("calibration", &self.calibration)
            .field("selection", &self.selection)
            .finish_non_exhaustive()
    }
}

impl Spectrometer {
    /// Validate `config` and load its coefficient file.
    pub fn from_config(config: SpectrometerConfig) -> Result<Self, InitError> {
        config.validate()?;
        let table = ReconTable::from_file(&config.recon_coeff_filename).map_err(|source| {
            InitError::ReconTable {
                path: config.recon_coeff_filename.clone(),
                source,
            }
        })?;
        Ok(Self::with_table(config, table))
    }

    /// Load configuration JSON and the coefficient file it names.
    pub fn from_json_file(path: &Path) -> Result<Self, InitError> {
        Self::from_config(SpectrometerConfig::from_json_file(path)?)
    }

    /// Build from an already loaded table; `config.recon_coeff_filename` is
    /// not read.
    pub fn with_table(config: SpectrometerConfig, table: ReconTable) -> Self {
        let calibration = CalibrationState::from_config(&config.calibration, *table.rotation());
        let selection = config.selection;
        if selection.sel_using_scin && selection.sel_using_prune {
            tracing::warn!(
                "{}: scintillator and prune selection both enabled, using prune",
                config.name
            );
        }
        tracing::info!(
            "{}: {} recon terms (max order {}), p_central {:.4} GeV/c, theta_lab {:.3} deg, \
             phi_central {:.3} deg, selection {:?}",
            config.name,
            table.len(),
            table.max_order(),
            calibration.p_central,
            calibration.theta_lab_deg,
            calibration.phi_central_deg,
            selection.method()
        );
        Self {
            name: config.name,
            table,
            calibration,
            selection,
            timing: Box::new(NoTimingRefinement),
        }
    }

    /// Replace the timing refinement run after selection.
    pub fn with_timing(mut self, timing: impl TimingRefinement + Send + Sync + 'static) -> Self {
        self.timing = Box::new(timing);
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn table(&self) -> &ReconTable {
        &self.table
    }

    pub fn calibration(&self) -> &CalibrationState {
        &self.calibration
    }

    pub fn selection_config(&self) -> &SelectionConfig {
        &self.selection
    }

    pub fn selection_method(&self) -> SelectionMethod {
        self.selection.method()
    }

    /// Fill target coordinates and momentum of every candidate.
    pub fn transform_tracks(&self, tracks: &mut dyn TrackList) -> Result<(), MissingCandidate> {
        let n_tracks = tracks.len();
        for index in 0..n_tracks {
            let track = tracks
                .get_mut(index)
                .ok_or(MissingCandidate { index, n_tracks })?;
            transform::apply_to_track(track, &self.calibration, &self.table);
        }
        Ok(())
    }

    /// Pick the golden track among already transformed candidates.
    pub fn select_golden(
        &self,
        tracks: &mut dyn TrackList,
        hodo: &dyn Hodoscope,
        workspace: &mut SelectionWorkspace,
    ) -> Result<GoldenSelection, MissingCandidate> {
        TrackSelector::new(&self.selection, &self.calibration).select(tracks, hodo, workspace)
    }

    /// Transform, select and refine timing for one event.
    pub fn reconstruct_event(
        &self,
        tracks: &mut dyn TrackList,
        hodo: &dyn Hodoscope,
        workspace: &mut SelectionWorkspace,
    ) -> Result<GoldenSelection, EventError> {
        self.transform_tracks(tracks)?;
        let selection = self.select_golden(tracks, hodo, workspace)?;
        self.timing.refine(tracks, hodo)?;
        Ok(selection)
    }

    /// [`Spectrometer::reconstruct_event`] with a fresh workspace.
    pub fn reconstruct(
        &self,
        tracks: &mut dyn TrackList,
        hodo: &dyn Hodoscope,
    ) -> Result<EventReconstruction, EventError> {
        let mut workspace = SelectionWorkspace::new();
        let selection = self.reconstruct_event(tracks, hodo, &mut workspace)?;
        Ok(EventReconstruction {
            selection,
            workspace,
        })
    }
}
