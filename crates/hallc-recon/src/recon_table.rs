//! Reconstruction matrix-element table.
//!
//! The coefficient file is a plain-text table in the layout written by the
//! COSY fitting tools:
//!
//! ```text
//! ! comment lines start with '!'
//!  h_ang_slope_x = 0.0
//!  h_z_true_focus = 0.0
//!  ---------------------------------------------------------------
//!   1.000000E+00  0.000000E+00  0.000000E+00  0.000000E+00 10000
//!  -2.510000E-02  4.200000E-01  0.000000E+00  1.300000E-03 01000
//!  ---------------------------------------------------------------
//! ```
//!
//! Each data line carries four coefficients (one per reconstructed target
//! quantity) followed by five single-digit exponents applied to the rotated
//! focal-plane vector. Term order is kept exactly as read.

use std::io::BufRead;
use std::path::Path;

use serde::{Deserialize, Serialize};

/// Number of reconstructed outputs per term: x-angle, y, y-angle, delta.
pub const N_OUTPUTS: usize = 4;
/// Number of polynomial inputs: x, x', y, y', raster y.
pub const N_INPUTS: usize = 5;

const COMMENT_MARKER: char = '!';
const SEPARATOR: &str = " ---";

// ── Error type ─────────────────────────────────────────────────────────────

/// Which block of the coefficient file was left unterminated.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TableBlock {
    /// Comment lines and header block before the first separator.
    Header,
    /// Matrix-element block before the second separator.
    Terms,
}

/// Errors that can occur while loading a reconstruction table.
#[derive(Debug)]
pub enum ReconTableError {
    /// The coefficient stream could not be opened or read.
    Io(std::io::Error),
    /// The stream ended before the block's closing separator line.
    Truncated {
        /// Block that was being read when the stream ended.
        block: TableBlock,
        /// Number of terms parsed before the stream ended.
        terms_read: usize,
    },
}

impl std::fmt::Display for ReconTableError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Io(e) => write!(f, "cannot read coefficient stream: {}", e),
            Self::Truncated {
                block: TableBlock::Header,
                ..
            } => write!(f, "header block is not terminated by a '{}' line", SEPARATOR),
            Self::Truncated {
                block: TableBlock::Terms,
                terms_read,
            } => write!(
                f,
                "matrix-element block is not terminated by a '{}' line ({} terms read)",
                SEPARATOR, terms_read
            ),
        }
    }
}

impl std::error::Error for ReconTableError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Io(e) => Some(e),
            Self::Truncated { .. } => None,
        }
    }
}

impl From<std::io::Error> for ReconTableError {
    fn from(e: std::io::Error) -> Self {
        Self::Io(e)
    }
}

// ── Types ──────────────────────────────────────────────────────────────────

/// One monomial of the transport map.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ReconTerm {
    /// Coefficient per output, in file column order.
    pub coeff: [f64; N_OUTPUTS],
    /// Exponent per input coordinate (0–9).
    pub exp: [u8; N_INPUTS],
}

impl ReconTerm {
    pub fn new(coeff: [f64; N_OUTPUTS], exp: [u8; N_INPUTS]) -> Self {
        Self { coeff, exp }
    }

    /// Total polynomial order of the term.
    pub fn order(&self) -> u32 {
        self.exp.iter().map(|&e| u32::from(e)).sum()
    }

    /// Evaluate the monomial at `point`.
    ///
    /// Factors with a zero exponent are the multiplicative identity and are
    /// never raised to a power, so `0^0` is not computed.
    #[inline]
    pub fn monomial(&self, point: &[f64; N_INPUTS]) -> f64 {
        let mut term = 1.0;
        for (&x, &e) in point.iter().zip(self.exp.iter()) {
            if e != 0 {
                term *= x.powi(i32::from(e));
            }
        }
        term
    }
}

/// Focal-plane rotation constants carried in the coefficient file header.
///
/// Header lines look like `h_ang_slope_x = -0.0012`; the single-letter
/// spectrometer prefix is ignored. Missing keys stay zero.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct FocalPlaneRotation {
    /// x' rotation per unit x (rad/m).
    pub ang_slope_x: f64,
    /// y' rotation per unit y (rad/m).
    pub ang_slope_y: f64,
    /// Constant x' offset (rad).
    pub ang_offset_x: f64,
    /// Constant y' offset (rad).
    pub ang_offset_y: f64,
    /// Constant x offset (m).
    pub det_offset_x: f64,
    /// Constant y offset (m).
    pub det_offset_y: f64,
    /// Distance from the detector reference plane to the true focus (m).
    pub z_true_focus: f64,
}

impl FocalPlaneRotation {
    /// Apply one header line. Returns `true` if it set a known key.
    fn apply_header_line(&mut self, line: &str) -> bool {
        let Some((key, value)) = split_header_assignment(line) else {
            return false;
        };
        let Ok(value) = value.parse::<f64>() else {
            tracing::debug!("ignoring header line with non-numeric value: {:?}", line);
            return false;
        };
        let slot = match key {
            "ang_slope_x" => &mut self.ang_slope_x,
            "ang_slope_y" => &mut self.ang_slope_y,
            "ang_offset_x" => &mut self.ang_offset_x,
            "ang_offset_y" => &mut self.ang_offset_y,
            "det_offset_x" => &mut self.det_offset_x,
            "det_offset_y" => &mut self.det_offset_y,
            "z_true_focus" => &mut self.z_true_focus,
            _ => return false,
        };
        *slot = value;
        true
    }
}

fn split_header_assignment(line: &str) -> Option<(&str, &str)> {
    let (lhs, rhs) = line.split_once('=')?;
    let name = lhs.trim();
    let (prefix, key) = name.split_once('_')?;
    if prefix.len() != 1 || !prefix.chars().all(|c| c.is_ascii_alphabetic()) {
        return None;
    }
    Some((key, rhs.trim()))
}

/// Ordered set of reconstruction terms plus header constants.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ReconTable {
    terms: Vec<ReconTerm>,
    rotation: FocalPlaneRotation,
    skipped_lines: usize,
}

impl ReconTable {
    /// Build a table from terms with zero header constants.
    pub fn new(terms: Vec<ReconTerm>) -> Self {
        Self {
            terms,
            rotation: FocalPlaneRotation::default(),
            skipped_lines: 0,
        }
    }

    /// Replace the focal-plane rotation constants.
    pub fn with_rotation(mut self, rotation: FocalPlaneRotation) -> Self {
        self.rotation = rotation;
        self
    }

    pub fn terms(&self) -> &[ReconTerm] {
        &self.terms
    }

    pub fn len(&self) -> usize {
        self.terms.len()
    }

    pub fn is_empty(&self) -> bool {
        self.terms.is_empty()
    }

    /// Rotation constants read from the header block.
    pub fn rotation(&self) -> &FocalPlaneRotation {
        &self.rotation
    }

    /// Data lines that could not be parsed and were skipped.
    pub fn skipped_lines(&self) -> usize {
        self.skipped_lines
    }

    /// Highest total order over all terms (0 for an empty table).
    pub fn max_order(&self) -> u32 {
        self.terms.iter().map(ReconTerm::order).max().unwrap_or(0)
    }

    /// Number of terms with a non-zero coefficient, per output.
    pub fn nonzero_counts(&self) -> [usize; N_OUTPUTS] {
        let mut counts = [0usize; N_OUTPUTS];
        for term in &self.terms {
            for (count, &c) in counts.iter_mut().zip(term.coeff.iter()) {
                if c != 0.0 {
                    *count += 1;
                }
            }
        }
        counts
    }

    /// Sum every term at `point`, one sum per output.
    pub fn evaluate(&self, point: &[f64; N_INPUTS]) -> [f64; N_OUTPUTS] {
        let mut sum = [0.0; N_OUTPUTS];
        for term in &self.terms {
            let m = term.monomial(point);
            for (s, &c) in sum.iter_mut().zip(term.coeff.iter()) {
                *s += m * c;
            }
        }
        sum
    }

    /// Load a table from a coefficient file.
    pub fn from_file(path: &Path) -> Result<Self, ReconTableError> {
        let file = std::fs::File::open(path)?;
        let table = Self::parse(std::io::BufReader::new(file))?;
        tracing::info!(
            "Read {} matrix element terms from {}",
            table.len(),
            path.display()
        );
        Ok(table)
    }

    /// Parse a table from any buffered reader.
    pub fn parse<R: BufRead>(reader: R) -> Result<Self, ReconTableError> {
        let mut block = ParseBlock::Comments;
        let mut table = Self::default();

        for line in reader.lines() {
            let line = line?;
            if block == ParseBlock::Comments {
                if line.starts_with(COMMENT_MARKER) {
                    continue;
                }
                block = ParseBlock::Header;
            }

            if block == ParseBlock::Header {
                if is_separator(&line) {
                    block = ParseBlock::Terms;
                } else {
                    table.rotation.apply_header_line(&line);
                }
                continue;
            }

            if is_separator(&line) {
                if table.skipped_lines > 0 {
                    tracing::warn!(
                        "skipped {} unparsable matrix element lines",
                        table.skipped_lines
                    );
                }
                return Ok(table);
            }
            match parse_term_line(&line) {
                Some(term) => table.terms.push(term),
                None => {
                    tracing::warn!("skipping malformed matrix element line: {:?}", line);
                    table.skipped_lines += 1;
                }
            }
        }

        let block = match block {
            ParseBlock::Comments | ParseBlock::Header => TableBlock::Header,
            ParseBlock::Terms => TableBlock::Terms,
        };
        Err(ReconTableError::Truncated {
            block,
            terms_read: table.terms.len(),
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ParseBlock {
    Comments,
    Header,
    Terms,
}

fn is_separator(line: &str) -> bool {
    line.starts_with(SEPARATOR)
}

/// Parse `%le %le %le %le %1d%1d%1d%1d%1d`.
fn parse_term_line(line: &str) -> Option<ReconTerm> {
    let mut rest = line;
    let mut coeff = [0.0; N_OUTPUTS];
    for c in coeff.iter_mut() {
        let (value, tail) = scan_float(rest)?;
        *c = value;
        rest = tail;
    }

    let mut digits = rest.chars().filter(|c| !c.is_whitespace());
    let mut exp = [0u8; N_INPUTS];
    for e in exp.iter_mut() {
        let d = digits.next()?.to_digit(10)?;
        *e = u8::try_from(d).ok()?;
    }
    Some(ReconTerm { coeff, exp })
}

/// Scan the longest floating-point prefix after leading whitespace.
///
/// Fixed-width columns may abut (`-1.0E-01-2.0E-01`), so tokens are not
/// split on whitespace alone.
fn scan_float(s: &str) -> Option<(f64, &str)> {
    let s = s.trim_start();
    let bytes = s.as_bytes();
    let digits_from = |mut i: usize| {
        while i < bytes.len() && bytes[i].is_ascii_digit() {
            i += 1;
        }
        i
    };

    let mut end = 0;
    if matches!(bytes.first(), Some(b'+' | b'-')) {
        end += 1;
    }
    end = digits_from(end);
    if bytes.get(end) == Some(&b'.') {
        end = digits_from(end + 1);
    }
    if matches!(bytes.get(end), Some(b'e' | b'E')) {
        let mut exp_end = end + 1;
        if matches!(bytes.get(exp_end), Some(b'+' | b'-')) {
            exp_end += 1;
        }
        let exp_digits_end = digits_from(exp_end);
        if exp_digits_end > exp_end {
            end = exp_digits_end;
        }
    }

    let value = s[..end].parse::<f64>().ok()?;
    Some((value, &s[end..]))
}
