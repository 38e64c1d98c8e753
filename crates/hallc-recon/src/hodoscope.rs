//! Hodoscope collaborator interface.

use serde::{Deserialize, Serialize};

/// Zero-based index of scintillator plane 3 (2X, paddles along x).
pub const PLANE_2X: usize = 2;
/// Zero-based index of scintillator plane 4 (2Y, paddles along y).
pub const PLANE_2Y: usize = 3;

/// Per-event view of the hodoscope used by golden-track selection.
///
/// Hits are exposed through one flat list ordered plane by plane; the hits
/// of plane `p` start at the sum of `n_hits` over planes `0..p`.
///
/// # Example
///
/// ```
/// use hallc_recon::Hodoscope;
///
/// struct Empty;
///
/// impl Hodoscope for Empty {
///     fn n_paddles(&self, _plane: usize) -> usize { 10 }
///     fn plane_center(&self, _plane: usize) -> f64 { 0.0 }
///     fn plane_spacing(&self, _plane: usize) -> f64 { 7.5 }
///     fn n_hits(&self, _plane: usize) -> usize { 0 }
///     fn hit_paddle(&self, _raw_index: usize) -> Option<usize> { None }
///     fn start_time_center(&self) -> f64 { 0.0 }
/// }
/// ```
pub trait Hodoscope {
    /// Number of paddles in `plane`.
    fn n_paddles(&self, plane: usize) -> usize;
    /// Position of the plane center along its measuring axis (cm).
    fn plane_center(&self, plane: usize) -> f64;
    /// Paddle pitch (cm).
    fn plane_spacing(&self, plane: usize) -> f64;
    /// Number of hits recorded in `plane` this event.
    fn n_hits(&self, plane: usize) -> usize;
    /// Zero-based paddle number of the hit at `raw_index` in the flat list.
    fn hit_paddle(&self, raw_index: usize) -> Option<usize>;
    /// Event start-time reference (ns).
    fn start_time_center(&self) -> f64;
}

/// Static geometry of one scintillator plane.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PlaneGeometry {
    pub n_paddles: usize,
    /// Plane center (cm).
    pub center: f64,
    /// Paddle pitch (cm).
    pub spacing: f64,
}

/// Owned hodoscope state for one event.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct HodoscopeSnapshot {
    pub planes: Vec<PlaneGeometry>,
    /// Zero-based hit paddles per plane, in readout order.
    #[serde(default)]
    pub hits: Vec<Vec<usize>>,
    /// Event start-time reference (ns).
    #[serde(default)]
    pub start_time_center: f64,
}

impl HodoscopeSnapshot {
    /// Geometry-only snapshot with no hits.
    pub fn new(planes: Vec<PlaneGeometry>) -> Self {
        let hits = vec![Vec::new(); planes.len()];
        Self {
            planes,
            hits,
            start_time_center: 0.0,
        }
    }

    /// Record hit paddles for `plane`, replacing previous hits.
    pub fn set_hits(&mut self, plane: usize, paddles: Vec<usize>) {
        if self.hits.len() <= plane {
            self.hits.resize(plane + 1, Vec::new());
        }
        self.hits[plane] = paddles;
    }
}

impl Hodoscope for HodoscopeSnapshot {
    fn n_paddles(&self, plane: usize) -> usize {
        self.planes.get(plane).map_or(0, |p| p.n_paddles)
    }

    fn plane_center(&self, plane: usize) -> f64 {
        self.planes.get(plane).map_or(0.0, |p| p.center)
    }

    fn plane_spacing(&self, plane: usize) -> f64 {
        self.planes.get(plane).map_or(0.0, |p| p.spacing)
    }

    fn n_hits(&self, plane: usize) -> usize {
        self.hits.get(plane).map_or(0, Vec::len)
    }

    fn hit_paddle(&self, raw_index: usize) -> Option<usize> {
        let mut remaining = raw_index;
        for plane_hits in &self.hits {
            if remaining < plane_hits.len() {
                return Some(plane_hits[remaining]);
            }
            remaining -= plane_hits.len();
        }
        None
    }

    fn start_time_center(&self) -> f64 {
        self.start_time_center
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn snapshot() -> HodoscopeSnapshot {
        let geom = PlaneGeometry {
            n_paddles: 10,
            center: 0.0,
            spacing: 8.0,
        };
        let mut hodo = HodoscopeSnapshot::new(vec![geom; 4]);
        hodo.set_hits(0, vec![3, 4]);
        hodo.set_hits(2, vec![7]);
        hodo.set_hits(3, vec![1, 2, 9]);
        hodo
    }

    #[test]
    fn flat_hit_list_is_plane_ordered() {
        let hodo = snapshot();
        let flat: Vec<Option<usize>> = (0..7).map(|i| hodo.hit_paddle(i)).collect();
        assert_eq!(
            flat,
            vec![Some(3), Some(4), Some(7), Some(1), Some(2), Some(9), None]
        );
        assert_eq!(hodo.n_hits(1), 0);
        assert_eq!(hodo.n_hits(3), 3);
    }

    #[test]
    fn out_of_range_plane_reports_empty() {
        let hodo = snapshot();
        assert_eq!(hodo.n_paddles(9), 0);
        assert_eq!(hodo.n_hits(9), 0);
    }
}
