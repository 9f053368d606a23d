//! Regridding onto a HEALPix discrete global grid
//!
//! Maps a dataset on a curvilinear `(y, x)` grid onto the ring-scheme
//! HEALPix cell set at a chosen `nside`. The interpolation plan (which
//! source cells feed which target cell, with what weight) is built once
//! from the grid geometry; every leading-dimension slice (time, depth)
//! is then reduced in parallel with the same plan.
//!
//! Target cells whose coverage falls below the `min_vertices` threshold
//! stay NaN. They are never zero-filled: a zero concentration is data,
//! an absent one is not.

use crate::dataset::GridDataset;
use crate::errors::{RegridError, Result};
use crate::grid::GridVertexSet;
use crate::healpix;
use crate::index::CellIndex;
use ndarray::{Array2, ArrayD};
use rayon::prelude::*;
use std::collections::HashMap;
use std::str::FromStr;

/// Interpolation strategy for distributing source values onto cells.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RegridMethod {
    /// Distance-weighted average of the nearest source cells
    Bilinear,
    /// Source-cell-area-weighted aggregation; approximately preserves
    /// the spatial integral of the field
    Conservative,
    /// Value of the single nearest source cell
    Nearest,
}

impl RegridMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            RegridMethod::Bilinear => "bilinear",
            RegridMethod::Conservative => "conservative",
            RegridMethod::Nearest => "nearest",
        }
    }
}

impl FromStr for RegridMethod {
    type Err = RegridError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "bilinear" => Ok(RegridMethod::Bilinear),
            "conservative" => Ok(RegridMethod::Conservative),
            "nearest" => Ok(RegridMethod::Nearest),
            other => Err(RegridError::InvalidParameter {
                message: format!(
                    "unknown method '{}' (expected bilinear, conservative or nearest)",
                    other
                ),
            }),
        }
    }
}

impl std::fmt::Display for RegridMethod {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Regrid parameters exposed to the operator.
#[derive(Debug, Clone)]
pub struct RegridConfig {
    /// HEALPix refinement; must be a positive power of two
    pub nside: usize,
    /// Minimum number of valid target-cell corners (1..=4) for the cell
    /// to be populated; 1 means any partial overlap counts
    pub min_vertices: usize,
    /// Interpolation strategy
    pub method: RegridMethod,
    /// Optional source mask over `(y, x)`; `true` keeps the cell
    pub mask: Option<Array2<bool>>,
}

impl RegridConfig {
    pub fn new(nside: usize, method: RegridMethod) -> Self {
        RegridConfig {
            nside,
            min_vertices: 1,
            method,
            mask: None,
        }
    }

    pub fn with_min_vertices(mut self, min_vertices: usize) -> Self {
        self.min_vertices = min_vertices;
        self
    }

    pub fn with_mask(mut self, mask: Array2<bool>) -> Self {
        self.mask = Some(mask);
        self
    }

    fn validate(&self, spatial_shape: (usize, usize)) -> Result<()> {
        healpix::validate_nside(self.nside)?;
        if !(1..=4).contains(&self.min_vertices) {
            return Err(RegridError::InvalidParameter {
                message: format!(
                    "min_vertices must be in 1..=4, got {}",
                    self.min_vertices
                ),
            });
        }
        if let Some(mask) = &self.mask {
            if mask.dim() != spatial_shape {
                return Err(RegridError::InvalidParameter {
                    message: format!(
                        "mask shape {:?} does not match source grid {:?}",
                        mask.dim(),
                        spatial_shape
                    ),
                });
            }
        }
        Ok(())
    }
}

/// A dataset indexed by HEALPix cell instead of `(y, x)`.
///
/// Leading dimensions of the source are carried through; the trailing
/// dimension is the full ring-ordered cell axis of length `12 * nside^2`,
/// with unpopulated cells NaN.
#[derive(Debug, Clone)]
pub struct HealpixDataset {
    pub name: String,
    pub nside: usize,
    /// Shape: leading source dims + (npix,)
    pub data: ArrayD<f32>,
    /// Leading source dim names + "cell"
    pub dims: Vec<String>,
    pub attrs: HashMap<String, String>,
}

impl HealpixDataset {
    /// Refinement level, `log2(nside)`.
    pub fn level(&self) -> u32 {
        healpix::grid_level(self.nside)
    }

    /// Total cell count, `12 * nside^2`.
    pub fn npix(&self) -> usize {
        healpix::npix(self.nside)
    }

    /// Conventional store name, `<variable>-healpix-lvl-<level>.zarr`.
    pub fn store_name(&self) -> String {
        format!("{}-healpix-lvl-{}.zarr", self.name, self.level())
    }

    /// Number of populated (non-NaN) entries across all slices.
    pub fn populated(&self) -> usize {
        self.data.iter().filter(|v| v.is_finite()).count()
    }
}

/// One target cell's interpolation plan: contributing source cells as
/// flat `(iy * nx + ix)` indices with weights. Empty means the cell
/// failed the coverage threshold.
type CellPlan = Vec<(usize, f64)>;

/// Regrid a coordinate-attached dataset onto the HEALPix cell set.
pub fn regrid_to_dggs(
    dataset: &GridDataset,
    vertices: &GridVertexSet,
    config: &RegridConfig,
) -> Result<HealpixDataset> {
    let (ny, nx) = dataset.spatial_shape()?;
    config.validate((ny, nx))?;
    if vertices.shape() != (ny, nx) {
        return Err(RegridError::Generic(format!(
            "grid vertex shape {:?} does not match variable spatial shape {:?}",
            vertices.shape(),
            (ny, nx)
        )));
    }
    if dataset.lat.is_none() || dataset.lon.is_none() {
        return Err(RegridError::Generic(format!(
            "variable '{}' has no attached coordinates; call with_coordinates first",
            dataset.name
        )));
    }

    let index = CellIndex::build(vertices);
    let npix = healpix::npix(config.nside);
    let plan = build_plan(vertices, &index, config, npix, nx);

    let src = dataset.data.as_slice().ok_or_else(|| {
        RegridError::Generic("source data is not in standard layout".to_string())
    })?;
    let outer = dataset.outer_len();
    let nsrc = ny * nx;

    // One flat parallel pass over (slice, cell); NaN contributions are
    // skipped and an all-NaN stencil yields NaN.
    let values: Vec<f32> = (0..outer * npix)
        .into_par_iter()
        .map(|flat| {
            let t = flat / npix;
            let pix = flat % npix;
            let entries = &plan[pix];
            if entries.is_empty() {
                return f32::NAN;
            }
            let slice = &src[t * nsrc..(t + 1) * nsrc];
            let mut sum = 0.0f64;
            let mut weight = 0.0f64;
            for &(s, w) in entries {
                let v = slice[s];
                if v.is_finite() {
                    sum += w * v as f64;
                    weight += w;
                }
            }
            if weight > 0.0 {
                (sum / weight) as f32
            } else {
                f32::NAN
            }
        })
        .collect();

    let mut shape: Vec<usize> = dataset.data.shape()[..dataset.dims.len() - 2].to_vec();
    shape.push(npix);
    let data = ArrayD::from_shape_vec(shape, values)?;

    let mut dims: Vec<String> = dataset.dims[..dataset.dims.len() - 2].to_vec();
    dims.push("cell".to_string());

    let mut attrs = dataset.attrs.clone();
    attrs.insert("grid_name".to_string(), "healpix".to_string());
    attrs.insert("healpix_nside".to_string(), config.nside.to_string());
    attrs.insert("healpix_order".to_string(), "ring".to_string());
    attrs.insert(
        "healpix_level".to_string(),
        healpix::grid_level(config.nside).to_string(),
    );
    attrs.insert(
        "regrid_method".to_string(),
        config.method.as_str().to_string(),
    );
    attrs.insert("source_variable".to_string(), dataset.name.clone());

    Ok(HealpixDataset {
        name: dataset.name.clone(),
        nside: config.nside,
        data,
        dims,
        attrs,
    })
}

/// Build the per-cell interpolation plan from the grid geometry.
fn build_plan(
    vertices: &GridVertexSet,
    index: &CellIndex,
    config: &RegridConfig,
    npix: usize,
    nx: usize,
) -> Vec<CellPlan> {
    let masked_out = |iy: usize, ix: usize| -> bool {
        config
            .mask
            .as_ref()
            .map(|m| !m[[iy, ix]])
            .unwrap_or(false)
    };

    // Conservative scatters source cells into target cells by center
    // membership, so its accumulation map is built up front.
    let scatter: Option<Vec<CellPlan>> = match config.method {
        RegridMethod::Conservative => {
            let (ny, nxs) = vertices.shape();
            let mut per_pix: Vec<CellPlan> = vec![Vec::new(); npix];
            for iy in 0..ny {
                for ix in 0..nxs {
                    if masked_out(iy, ix) {
                        continue;
                    }
                    let lat = vertices.center_lat[[iy, ix]];
                    let lon = vertices.center_lon[[iy, ix]];
                    if !lat.is_finite() || !lon.is_finite() {
                        continue;
                    }
                    let pix = healpix::latlon_to_pix(config.nside, lat, lon);
                    let area = vertices.cell_area(iy, ix);
                    if area.is_finite() && area > 0.0 {
                        per_pix[pix].push((iy * nx + ix, area));
                    }
                }
            }
            Some(per_pix)
        }
        _ => None,
    };

    (0..npix)
        .into_par_iter()
        .map(|pix| {
            // Coverage first: count corner samples landing on valid
            // (in-domain, unmasked) source geometry.
            let corners = healpix::pixel_corner_samples(config.nside, pix);
            let valid_corners = corners
                .iter()
                .filter(|&&(clat, clon)| {
                    index
                        .nearest(clat, clon)
                        .map(|m| index.within_domain(&m) && !masked_out(m.iy, m.ix))
                        .unwrap_or(false)
                })
                .count();
            if valid_corners < config.min_vertices {
                return Vec::new();
            }

            let (lat, lon) = healpix::pix_to_latlon(config.nside, pix);
            match config.method {
                RegridMethod::Nearest => index
                    .nearest(lat, lon)
                    .filter(|m| !masked_out(m.iy, m.ix))
                    .map(|m| vec![(m.iy * nx + m.ix, 1.0)])
                    .unwrap_or_default(),
                RegridMethod::Bilinear => index
                    .nearest_k(lat, lon, 4)
                    .into_iter()
                    .filter(|m| !masked_out(m.iy, m.ix))
                    .map(|m| (m.iy * nx + m.ix, 1.0 / (m.distance + 1e-12)))
                    .collect(),
                RegridMethod::Conservative => {
                    let entries = scatter.as_ref().map(|s| s[pix].clone()).unwrap_or_default();
                    if entries.is_empty() {
                        // No source center fell inside this cell; fall back
                        // to the nearest source cell so coarse targets over
                        // fine sources stay covered
                        index
                            .nearest(lat, lon)
                            .filter(|m| !masked_out(m.iy, m.ix))
                            .map(|m| vec![(m.iy * nx + m.ix, 1.0)])
                            .unwrap_or_default()
                    } else {
                        entries
                    }
                }
            }
        })
        .collect()
}

/// Cell-wise difference `a - b` between two regrid results.
///
/// A diagnostic for comparing interpolation methods; bilinear and
/// conservative legitimately diverge, so no tolerance is asserted here.
pub fn regrid_difference(a: &HealpixDataset, b: &HealpixDataset) -> Result<ArrayD<f32>> {
    if a.data.shape() != b.data.shape() || a.nside != b.nside {
        return Err(RegridError::Generic(format!(
            "cannot difference regrids of shapes {:?} and {:?} (nside {} vs {})",
            a.data.shape(),
            b.data.shape(),
            a.nside,
            b.nside
        )));
    }
    Ok(&a.data - &b.data)
}
