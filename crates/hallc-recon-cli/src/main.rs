//! hallc-recon CLI — coefficient table inspection and event replay.

use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

use hallc_recon::{
    HodoscopeSnapshot, ReconTable, SelectionMethod, SelectionWorkspace, Spectrometer,
    Track, N_OUTPUTS,
};

type CliError = Box<dyn std::error::Error>;
type CliResult<T> = Result<T, CliError>;

#[derive(Parser)]
#[command(name = "hallc-recon")]
#[command(about = "Hall C spectrometer target reconstruction and golden-track selection")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Load a reconstruction coefficient file and print a summary.
    CoeffsInfo {
        /// Path to the coefficient file.
        #[arg(long)]
        file: PathBuf,
    },

    /// Reconstruct recorded events and report the golden track of each.
    Replay(CliReplayArgs),
}

#[derive(Debug, Clone, Args)]
struct CliReplayArgs {
    /// Spectrometer configuration (JSON).
    #[arg(long)]
    config: PathBuf,

    /// Recorded events (JSON array of event records).
    #[arg(long)]
    events: PathBuf,

    /// Path to write per-event results (JSON).
    #[arg(long)]
    out: Option<PathBuf>,
}

/// One recorded event: tracking candidates plus the hodoscope state.
#[derive(Debug, serde::Deserialize)]
struct EventRecord {
    tracks: Vec<Track>,
    #[serde(default)]
    hodoscope: HodoscopeSnapshot,
}

#[derive(Debug, serde::Serialize)]
struct EventOutcome {
    event: usize,
    golden: Option<usize>,
    method: SelectionMethod,
    fallback: bool,
    tracks: Vec<Track>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
}

fn main() -> CliResult<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::CoeffsInfo { file } => run_coeffs_info(&file),
        Commands::Replay(args) => run_replay(&args),
    }
}

// ── coeffs-info ────────────────────────────────────────────────────────

fn run_coeffs_info(file: &std::path::Path) -> CliResult<()> {
    let table = ReconTable::from_file(file)
        .map_err(|e| -> CliError { format!("{}: {}", file.display(), e).into() })?;

    let labels: [&str; N_OUTPUTS] = ["x'_tar", "y_tar", "y'_tar", "delta"];
    let counts = table.nonzero_counts();
    let rot = table.rotation();

    println!("reconstruction table {}", file.display());
    println!("  terms:          {}", table.len());
    println!("  max order:      {}", table.max_order());
    println!("  skipped lines:  {}", table.skipped_lines());
    for (label, count) in labels.iter().zip(counts) {
        println!("  {:<8} non-zero coefficients: {}", label, count);
    }
    println!(
        "  rotation:       ang_slope x={} y={}, ang_offset x={} y={}",
        rot.ang_slope_x, rot.ang_slope_y, rot.ang_offset_x, rot.ang_offset_y
    );
    println!(
        "  offsets:        det_offset x={} y={}, z_true_focus={}",
        rot.det_offset_x, rot.det_offset_y, rot.z_true_focus
    );

    Ok(())
}

// ── replay ─────────────────────────────────────────────────────────────

fn run_replay(args: &CliReplayArgs) -> CliResult<()> {
    let spectrometer = Spectrometer::from_json_file(&args.config)?;

    tracing::info!("Loading events: {}", args.events.display());
    let data = std::fs::read_to_string(&args.events)?;
    let records: Vec<EventRecord> = serde_json::from_str(&data)?;

    let method = spectrometer.selection_method();
    let mut ws = SelectionWorkspace::new();
    let mut outcomes = Vec::with_capacity(records.len());
    let (mut n_golden, mut n_fallback, mut n_failed) = (0usize, 0usize, 0usize);

    for (event, mut record) in records.into_iter().enumerate() {
        let result =
            spectrometer.reconstruct_event(&mut record.tracks, &record.hodoscope, &mut ws);
        let outcome = match result {
            Ok(sel) => {
                n_golden += usize::from(sel.golden.is_some());
                n_fallback += usize::from(sel.fallback);
                tracing::debug!("event {}: golden {:?}", event, sel.golden);
                EventOutcome {
                    event,
                    golden: sel.golden,
                    method: sel.method,
                    fallback: sel.fallback,
                    tracks: record.tracks,
                    error: None,
                }
            }
            Err(e) => {
                n_failed += 1;
                tracing::warn!("event {} skipped: {}", event, e);
                EventOutcome {
                    event,
                    golden: None,
                    method,
                    fallback: false,
                    tracks: record.tracks,
                    error: Some(e.to_string()),
                }
            }
        };
        outcomes.push(outcome);
    }

    tracing::info!(
        "Replayed {} events with {:?}: {} golden, {} fallback, {} failed",
        outcomes.len(),
        method,
        n_golden,
        n_fallback,
        n_failed,
    );

    if let Some(out) = &args.out {
        let json = serde_json::to_string_pretty(&outcomes)?;
        std::fs::write(out, &json)?;
        tracing::info!("Results written to {}", out.display());
    }

    Ok(())
}
