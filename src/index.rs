//! Spatial index over source grid cells
//!
//! The regridder needs nearest-source-cell queries for arbitrary target
//! directions. On a curvilinear tripolar grid the (lat, lon) -> (iy, ix)
//! map has no closed form, so cell centers are embedded as unit vectors
//! on the sphere and indexed with an R-tree; chord distance between unit
//! vectors is monotonic in great-circle distance.

use crate::grid::GridVertexSet;
use rstar::primitives::GeomWithData;
use rstar::RTree;

type CellPoint = GeomWithData<[f64; 3], (usize, usize)>;

/// A matched source cell: grid indices plus chord distance to the query.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CellMatch {
    pub iy: usize,
    pub ix: usize,
    pub distance: f64,
}

/// R-tree over the cell centers of a source grid.
pub struct CellIndex {
    tree: RTree<CellPoint>,
    spacing: f64,
}

fn unit_vector(lat_deg: f64, lon_deg: f64) -> [f64; 3] {
    let lat = lat_deg.to_radians();
    let lon = lon_deg.to_radians();
    [lat.cos() * lon.cos(), lat.cos() * lon.sin(), lat.sin()]
}

fn chord(a: &[f64; 3], b: &[f64; 3]) -> f64 {
    let dx = a[0] - b[0];
    let dy = a[1] - b[1];
    let dz = a[2] - b[2];
    (dx * dx + dy * dy + dz * dz).sqrt()
}

impl CellIndex {
    /// Build the index from a vertex set, skipping cells with
    /// non-finite coordinates (tripolar grids pad unused rows with fill).
    pub fn build(vertices: &GridVertexSet) -> Self {
        let (ny, nx) = vertices.shape();
        let mut points = Vec::with_capacity(ny * nx);
        for iy in 0..ny {
            for ix in 0..nx {
                let lat = vertices.center_lat[[iy, ix]];
                let lon = vertices.center_lon[[iy, ix]];
                if lat.is_finite() && lon.is_finite() {
                    points.push(CellPoint::new(unit_vector(lat, lon), (iy, ix)));
                }
            }
        }
        let spacing = estimate_spacing(vertices);
        CellIndex {
            tree: RTree::bulk_load(points),
            spacing,
        }
    }

    /// Typical chord distance between adjacent source cells.
    pub fn spacing(&self) -> f64 {
        self.spacing
    }

    /// Nearest source cell to a geographic direction.
    pub fn nearest(&self, lat: f64, lon: f64) -> Option<CellMatch> {
        let q = unit_vector(lat, lon);
        self.tree.nearest_neighbor(&q).map(|p| CellMatch {
            iy: p.data.0,
            ix: p.data.1,
            distance: chord(p.geom(), &q),
        })
    }

    /// The `k` nearest source cells, closest first.
    pub fn nearest_k(&self, lat: f64, lon: f64, k: usize) -> Vec<CellMatch> {
        let q = unit_vector(lat, lon);
        self.tree
            .nearest_neighbor_iter(&q)
            .take(k)
            .map(|p| CellMatch {
                iy: p.data.0,
                ix: p.data.1,
                distance: chord(p.geom(), &q),
            })
            .collect()
    }

    /// Whether a matched cell is close enough to its query to count as
    /// inside the gridded domain, relative to the grid spacing.
    pub fn within_domain(&self, m: &CellMatch) -> bool {
        m.distance <= 1.5 * self.spacing
    }

    /// Whether a direction lies inside the gridded domain, judged by the
    /// distance to its nearest cell relative to the grid spacing.
    pub fn in_domain(&self, lat: f64, lon: f64) -> bool {
        self.nearest(lat, lon)
            .map(|m| self.within_domain(&m))
            .unwrap_or(false)
    }
}

/// Mean chord distance between x- and y-adjacent cell centers, sampled
/// over the grid interior.
fn estimate_spacing(vertices: &GridVertexSet) -> f64 {
    let (ny, nx) = vertices.shape();
    let mut total = 0.0;
    let mut count = 0usize;

    let step_y = (ny / 32).max(1);
    let step_x = (nx / 32).max(1);
    for iy in (0..ny.saturating_sub(1)).step_by(step_y) {
        for ix in (0..nx.saturating_sub(1)).step_by(step_x) {
            let c = unit_vector(
                vertices.center_lat[[iy, ix]],
                vertices.center_lon[[iy, ix]],
            );
            let right = unit_vector(
                vertices.center_lat[[iy, ix + 1]],
                vertices.center_lon[[iy, ix + 1]],
            );
            let up = unit_vector(
                vertices.center_lat[[iy + 1, ix]],
                vertices.center_lon[[iy + 1, ix]],
            );
            let dr = chord(&c, &right);
            let du = chord(&c, &up);
            if dr.is_finite() && du.is_finite() {
                total += dr.max(du);
                count += 1;
            }
        }
    }

    if count == 0 {
        // Degenerate grid; fall back to a whole-sphere scale
        2.0
    } else {
        total / count as f64
    }
}
