//! healpix_regrid: HEALPix regridding for gridded ocean-model output
//!
//! A Rust library for taking model output on a curvilinear (e.g.
//! tripolar) latitude/longitude grid out of NetCDF files, standardizing
//! its variable and dimension names, regridding it onto a HEALPix
//! discrete global grid system, and persisting the result to a chunked
//! Zarr-style array store.
//!
//! ## Key Features
//!
//! - **Grid geometry**: cell center and corner vertices loaded from a
//!   grid-definition file
//! - **Name standardization**: model-family dimension and coordinate
//!   names remapped to one canonical vocabulary
//! - **Regridding**: bilinear, conservative and nearest interpolation
//!   onto the ring-scheme HEALPix cell set, with a configurable
//!   coverage threshold and optional source mask
//! - **Chunked export**: Zarr-v2-style store with NaN fill, written in
//!   parallel with Rayon
//!
//! ## Module Organization
//!
//! - [`dataset`]: labeled-array loading from NetCDF
//! - [`grid`]: grid-definition vertex loading
//! - [`standardize`]: canonical variable/dimension naming
//! - [`healpix`]: ring-scheme HEALPix pixelization math
//! - [`index`]: R-tree nearest-source-cell queries
//! - [`regrid`]: the regridding kernels and configuration
//! - [`zarr_io`]: chunked array store I/O
//! - [`metadata`]: NetCDF file inspection
//! - [`parallel`]: thread pool configuration
//! - [`errors`]: centralized error handling
//!
//! ## Usage
//!
//! ```rust,no_run
//! use healpix_regrid::prelude::*;
//! use std::path::Path;
//!
//! let vertices = healpix_regrid::grid::load_grid_vertices(Path::new("grid.nc")).unwrap();
//! let dataset = healpix_regrid::dataset::open_dataset(Path::new("u236.nc"), "u236").unwrap()
//!     .with_coordinates(&vertices).unwrap();
//! let dataset = healpix_regrid::standardize::standardize(dataset).unwrap();
//!
//! let config = RegridConfig::new(32, RegridMethod::Bilinear);
//! let cells = healpix_regrid::regrid::regrid_to_dggs(&dataset, &vertices, &config).unwrap();
//! healpix_regrid::zarr_io::write_healpix_store(Path::new("."), &cells).unwrap();
//! ```

// Core modules
pub mod cli;
pub mod dataset;
pub mod errors;
pub mod grid;
pub mod healpix;
pub mod index;
pub mod metadata;
pub mod parallel;
pub mod regrid;
pub mod standardize;
pub mod zarr_io;

// Direct re-exports for the public API
pub use dataset::{open_dataset, GridDataset};
pub use errors::{RegridError, Result};
pub use grid::{load_grid_vertices, GridVertexSet};
pub use regrid::{regrid_to_dggs, HealpixDataset, RegridConfig, RegridMethod};
pub use standardize::standardize;

// High-level convenience API
pub mod prelude {
    //! Commonly used imports for convenience
    pub use crate::dataset::GridDataset;
    pub use crate::errors::{RegridError, Result};
    pub use crate::grid::GridVertexSet;
    pub use crate::parallel::ParallelConfig;
    pub use crate::regrid::{HealpixDataset, RegridConfig, RegridMethod};
}
