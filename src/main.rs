//! Entry point for the healpix-regrid tool.
//! Handles CLI parsing and drives the pipeline: load source dataset,
//! attach grid coordinates, standardize names, regrid, write the store.

use clap::Parser;
use healpix_regrid::cli::Args;
use healpix_regrid::dataset::load_variable;
use healpix_regrid::errors::{RegridError, Result};
use healpix_regrid::metadata::{describe_variable, list_variables_and_dimensions};
use healpix_regrid::parallel::ParallelConfig;
use healpix_regrid::regrid::{regrid_difference, regrid_to_dggs, RegridConfig};
use healpix_regrid::standardize::standardize;
use healpix_regrid::{load_grid_vertices, zarr_io};
use ndarray::Array2;

fn main() -> std::result::Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();

    ParallelConfig::new(args.threads).setup_global_pool()?;

    let file = netcdf::open(&args.file)?;
    println!("Opened NetCDF file: {}", args.file.display());

    if args.list_vars {
        list_variables_and_dimensions(&file)?;
        return Ok(());
    }
    if let Some(var) = &args.describe {
        describe_variable(&file, var)?;
        return Ok(());
    }

    let grid_path = args.grid.as_ref().ok_or_else(|| {
        RegridError::Generic("--grid is required for regridding".to_string())
    })?;
    let var_name = args.variable.as_ref().ok_or_else(|| {
        RegridError::Generic("--variable is required for regridding".to_string())
    })?;

    let vertices = load_grid_vertices(grid_path)?;
    println!(
        "Loaded grid vertices: {} x {} cells",
        vertices.shape().0,
        vertices.shape().1
    );

    let dataset = load_variable(&file, var_name)?.with_coordinates(&vertices)?;
    let dataset = standardize(dataset)?;
    println!(
        "Loaded variable '{}' with dimensions [{}]",
        dataset.name,
        dataset.dims.join(", ")
    );

    let mut config = RegridConfig::new(args.nside, args.method)
        .with_min_vertices(args.min_vertices);
    if let Some(mask_var) = &args.mask_variable {
        config = config.with_mask(load_mask(&file, mask_var)?);
    }

    let cells = regrid_to_dggs(&dataset, &vertices, &config)?;
    println!(
        "Regridded to nside={} (level {}, {} cells, {} populated values) with {}",
        cells.nside,
        cells.level(),
        cells.npix(),
        cells.populated(),
        config.method
    );

    if let Some(other_method) = args.compare_method {
        let other_config = RegridConfig {
            method: other_method,
            ..config.clone()
        };
        let other = regrid_to_dggs(&dataset, &vertices, &other_config)?;
        let diff = regrid_difference(&cells, &other)?;
        let finite: Vec<f32> = diff.iter().cloned().filter(|v| v.is_finite()).collect();
        if finite.is_empty() {
            println!("Method comparison: no overlapping populated cells");
        } else {
            let max_abs = finite.iter().fold(0.0f32, |acc, v| acc.max(v.abs()));
            let mean_abs = finite.iter().map(|v| v.abs()).sum::<f32>() / finite.len() as f32;
            println!(
                "Method comparison ({} vs {}): max |diff| = {:.6e}, mean |diff| = {:.6e}",
                config.method, other_method, max_abs, mean_abs
            );
        }
    }

    let store = zarr_io::write_healpix_store(&args.output, &cells)?;
    println!("Saved result to {}", store.display());

    Ok(())
}

/// Read a mask variable: the trailing `(y, x)` slice, nonzero keeps the cell.
fn load_mask(file: &netcdf::File, mask_var: &str) -> Result<Array2<bool>> {
    let dataset = load_variable(file, mask_var)?;
    let (ny, nx) = dataset.spatial_shape()?;
    if dataset.data.ndim() != 2 {
        return Err(RegridError::InvalidParameter {
            message: format!(
                "mask variable '{}' must be 2-D, has {} dimensions",
                mask_var,
                dataset.data.ndim()
            ),
        });
    }
    let mut mask = Array2::from_elem((ny, nx), false);
    for ((iy, ix), m) in mask.indexed_iter_mut() {
        let v = dataset.data[[iy, ix]];
        *m = v.is_finite() && v != 0.0;
    }
    Ok(mask)
}
