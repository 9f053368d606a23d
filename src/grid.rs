//! Grid-definition file loading
//!
//! Ocean-model output on a curvilinear (e.g. tripolar) grid ships its
//! cell geometry in a separate grid-definition NetCDF file. This module
//! reads the four vertex fields — cell-center latitude/longitude over
//! `(y, x)` and cell-corner latitude/longitude over `(y, x, 4)` — into a
//! [`GridVertexSet`], consulting a fixed synonym table for the field
//! names the common model families use.

use crate::errors::{RegridError, Result};
use ndarray::{Array2, Array3, ArrayD};
use netcdf::File;
use std::path::Path;

/// Field-name synonyms checked in order, SCRIP names first.
const CENTER_LAT_NAMES: &[&str] = &["grid_center_lat", "nav_lat", "TLAT", "latt"];
const CENTER_LON_NAMES: &[&str] = &["grid_center_lon", "nav_lon", "TLONG", "lont"];
const CORNER_LAT_NAMES: &[&str] = &["grid_corner_lat", "bounds_nav_lat", "lat_vertices"];
const CORNER_LON_NAMES: &[&str] = &["grid_corner_lon", "bounds_nav_lon", "lon_vertices"];

/// Per-cell geometry of a curvilinear source grid.
///
/// Corner arrays carry one extra vertex dimension of length 4 and align
/// positionally with the center arrays.
#[derive(Debug, Clone)]
pub struct GridVertexSet {
    /// Cell-center latitude, degrees, shape `(y, x)`
    pub center_lat: Array2<f64>,
    /// Cell-center longitude, degrees, shape `(y, x)`
    pub center_lon: Array2<f64>,
    /// Cell-corner latitude, degrees, shape `(y, x, 4)`
    pub corner_lat: Array3<f64>,
    /// Cell-corner longitude, degrees, shape `(y, x, 4)`
    pub corner_lon: Array3<f64>,
}

impl GridVertexSet {
    /// `(y, x)` shape of the grid.
    pub fn shape(&self) -> (usize, usize) {
        self.center_lat.dim()
    }

    /// Spherical area of one cell in steradians, from its corner vertices.
    ///
    /// The corner quadrilateral is split into two spherical triangles and
    /// each solid angle computed with the Van Oosterom-Strackee formula.
    pub fn cell_area(&self, iy: usize, ix: usize) -> f64 {
        let v: Vec<[f64; 3]> = (0..4)
            .map(|k| unit_vector(self.corner_lat[[iy, ix, k]], self.corner_lon[[iy, ix, k]]))
            .collect();
        spherical_triangle_area(&v[0], &v[1], &v[2]) + spherical_triangle_area(&v[0], &v[2], &v[3])
    }
}

fn unit_vector(lat_deg: f64, lon_deg: f64) -> [f64; 3] {
    let lat = lat_deg.to_radians();
    let lon = lon_deg.to_radians();
    [lat.cos() * lon.cos(), lat.cos() * lon.sin(), lat.sin()]
}

fn spherical_triangle_area(a: &[f64; 3], b: &[f64; 3], c: &[f64; 3]) -> f64 {
    let triple = a[0] * (b[1] * c[2] - b[2] * c[1]) - a[1] * (b[0] * c[2] - b[2] * c[0])
        + a[2] * (b[0] * c[1] - b[1] * c[0]);
    let dot_ab = a[0] * b[0] + a[1] * b[1] + a[2] * b[2];
    let dot_bc = b[0] * c[0] + b[1] * c[1] + b[2] * c[2];
    let dot_ca = c[0] * a[0] + c[1] * a[1] + c[2] * a[2];
    let denom = 1.0 + dot_ab + dot_bc + dot_ca;
    2.0 * (triple.abs() / denom.abs().max(f64::EPSILON)).atan()
}

/// Load the four vertex fields from a grid-definition NetCDF file.
///
/// Fails with a file-format error when the file cannot be opened, a field
/// is absent under every known synonym, or the corner arrays do not have
/// shape `centers.shape + (4,)`.
pub fn load_grid_vertices(path: &Path) -> Result<GridVertexSet> {
    let file = netcdf::open(path).map_err(|e| RegridError::FileFormat {
        path: path.display().to_string(),
        reason: format!("cannot open grid-definition file: {}", e),
    })?;

    let center_lat = read_center_field(&file, path, CENTER_LAT_NAMES)?;
    let center_lon = read_center_field(&file, path, CENTER_LON_NAMES)?;
    let corner_lat = read_corner_field(&file, path, CORNER_LAT_NAMES)?;
    let corner_lon = read_corner_field(&file, path, CORNER_LON_NAMES)?;

    let (ny, nx) = center_lat.dim();
    if center_lon.dim() != (ny, nx) {
        return Err(format_err(path, "center latitude/longitude shapes differ"));
    }
    for corners in [&corner_lat, &corner_lon] {
        if corners.dim() != (ny, nx, 4) {
            return Err(format_err(
                path,
                &format!(
                    "corner array shape {:?} does not equal centers {:?} + (4,)",
                    corners.dim(),
                    (ny, nx)
                ),
            ));
        }
    }

    Ok(GridVertexSet {
        center_lat,
        center_lon,
        corner_lat,
        corner_lon,
    })
}

fn format_err(path: &Path, reason: &str) -> RegridError {
    RegridError::FileFormat {
        path: path.display().to_string(),
        reason: reason.to_string(),
    }
}

fn read_raw_field(file: &File, path: &Path, names: &[&str]) -> Result<ArrayD<f64>> {
    let var = names
        .iter()
        .find_map(|n| file.variable(n))
        .ok_or_else(|| {
            format_err(
                path,
                &format!("none of the expected fields {:?} present", names),
            )
        })?;

    let shape: Vec<usize> = var.dimensions().iter().map(|d| d.len()).collect();
    let values = var.get_values::<f64, _>(..).map_err(|e| {
        format_err(path, &format!("cannot read field '{}': {}", var.name(), e))
    })?;
    Ok(ArrayD::from_shape_vec(shape, values)?)
}

fn read_center_field(file: &File, path: &Path, names: &[&str]) -> Result<Array2<f64>> {
    let raw = read_raw_field(file, path, names)?;
    raw.into_dimensionality::<ndarray::Ix2>()
        .map_err(|_| format_err(path, &format!("center field {:?} is not 2-D", names)))
}

fn read_corner_field(file: &File, path: &Path, names: &[&str]) -> Result<Array3<f64>> {
    let raw = read_raw_field(file, path, names)?;
    let arr = raw
        .into_dimensionality::<ndarray::Ix3>()
        .map_err(|_| format_err(path, &format!("corner field {:?} is not 3-D", names)))?;

    // Accept the (4, y, x) layout some model families write and move the
    // vertex axis last.
    let (d0, _, d2) = arr.dim();
    if d0 == 4 && d2 != 4 {
        let mut permuted = Array3::zeros((arr.dim().1, arr.dim().2, 4));
        for ((k, iy, ix), &v) in arr.indexed_iter() {
            permuted[[iy, ix, k]] = v;
        }
        Ok(permuted)
    } else {
        Ok(arr)
    }
}
