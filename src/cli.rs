//! Defines command-line interface options using `clap` for the regridding tool.

use crate::regrid::RegridMethod;
use clap::Parser;
use std::path::PathBuf;
use std::str::FromStr;

/// A CLI tool for regridding NetCDF model output onto HEALPix grids
#[derive(Parser, Debug)]
#[command(
    version,
    name = "healpix-regrid",
    about = "Regrid gridded ocean-model output onto a HEALPix cell set and export it as a chunked Zarr store"
)]
pub struct Args {
    /// Path to the NetCDF file with the model output
    #[arg(short, long)]
    pub file: PathBuf,

    /// Path to the grid-definition file with cell vertex geometry
    #[arg(short, long)]
    pub grid: Option<PathBuf>,

    /// Variable to regrid
    #[arg(long)]
    pub variable: Option<String>,

    /// HEALPix refinement parameter; must be a power of two
    #[arg(long, default_value_t = 32, value_parser = parse_nside)]
    pub nside: usize,

    /// Minimum number of valid target-cell corners (1-4) required to
    /// populate a cell
    #[arg(long, default_value_t = 1)]
    pub min_vertices: usize,

    /// Interpolation method: bilinear, conservative or nearest
    #[arg(long, default_value = "bilinear", value_parser = parse_method)]
    pub method: RegridMethod,

    /// Variable in the input file to use as a source mask (nonzero keeps
    /// the cell)
    #[arg(long)]
    pub mask_variable: Option<String>,

    /// Also regrid with a second method and report the cell-wise
    /// difference against the primary result
    #[arg(long, value_parser = parse_method)]
    pub compare_method: Option<RegridMethod>,

    /// Directory to write the output store into
    #[arg(short, long, default_value = ".")]
    pub output: PathBuf,

    /// Number of threads to use for parallel processing. Defaults to the
    /// number of CPU cores.
    #[arg(short = 't', long)]
    pub threads: Option<usize>,

    /// List all variables and dimensions in the input file
    #[arg(long)]
    pub list_vars: bool,

    /// Describe a specific variable (data type, shape, and attributes)
    #[arg(long)]
    pub describe: Option<String>,
}

fn parse_nside(s: &str) -> Result<usize, String> {
    let nside: usize = s
        .parse()
        .map_err(|_| format!("'{}' is not a valid nside", s))?;
    if nside == 0 || !nside.is_power_of_two() {
        return Err(format!("nside must be a positive power of two, got {}", nside));
    }
    Ok(nside)
}

fn parse_method(s: &str) -> Result<RegridMethod, String> {
    RegridMethod::from_str(s).map_err(|e| e.to_string())
}
