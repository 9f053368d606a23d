//! Integration tests for the full regridding pipeline
//!
//! These tests create real NetCDF fixtures on disk, run the load ->
//! attach coordinates -> standardize -> regrid -> store sequence, and
//! check the regridding and round-trip properties.

use healpix_regrid::dataset::{open_dataset, GridDataset};
use healpix_regrid::errors::{RegridError, Result};
use healpix_regrid::grid::{load_grid_vertices, GridVertexSet};
use healpix_regrid::regrid::{
    regrid_difference, regrid_to_dggs, RegridConfig, RegridMethod,
};
use healpix_regrid::standardize::standardize;
use healpix_regrid::zarr_io::{read_cell_ids, read_healpix_store, write_healpix_store};
use ndarray::{Array2, Array3, ArrayD};
use netcdf::create;
use std::collections::HashMap;
use std::path::Path;
use tempfile::tempdir;

/// Regular lat/lon grid expressed as a curvilinear vertex set.
fn synthetic_vertices(
    ny: usize,
    nx: usize,
    lat0: f64,
    lat1: f64,
    lon0: f64,
    lon1: f64,
) -> GridVertexSet {
    let dlat = (lat1 - lat0) / ny as f64;
    let dlon = (lon1 - lon0) / nx as f64;
    let mut center_lat = Array2::zeros((ny, nx));
    let mut center_lon = Array2::zeros((ny, nx));
    let mut corner_lat = Array3::zeros((ny, nx, 4));
    let mut corner_lon = Array3::zeros((ny, nx, 4));
    for iy in 0..ny {
        for ix in 0..nx {
            center_lat[[iy, ix]] = lat0 + (iy as f64 + 0.5) * dlat;
            center_lon[[iy, ix]] = lon0 + (ix as f64 + 0.5) * dlon;
            let south = lat0 + iy as f64 * dlat;
            let west = lon0 + ix as f64 * dlon;
            let corners = [
                (south, west),
                (south, west + dlon),
                (south + dlat, west + dlon),
                (south + dlat, west),
            ];
            for (k, (clat, clon)) in corners.iter().enumerate() {
                corner_lat[[iy, ix, k]] = *clat;
                corner_lon[[iy, ix, k]] = *clon;
            }
        }
    }
    GridVertexSet {
        center_lat,
        center_lon,
        corner_lat,
        corner_lon,
    }
}

/// In-memory dataset over a vertex set with a caller-supplied field.
fn dataset_on(
    vertices: &GridVertexSet,
    field: impl Fn(f64, f64) -> f32,
) -> GridDataset {
    let (ny, nx) = vertices.shape();
    let mut values = Vec::with_capacity(ny * nx);
    for iy in 0..ny {
        for ix in 0..nx {
            values.push(field(
                vertices.center_lat[[iy, ix]],
                vertices.center_lon[[iy, ix]],
            ));
        }
    }
    GridDataset {
        name: "u236".to_string(),
        data: ArrayD::from_shape_vec(vec![ny, nx], values).unwrap(),
        dims: vec!["y".to_string(), "x".to_string()],
        lat: None,
        lon: None,
        attrs: HashMap::new(),
        fill_value: None,
    }
    .with_coordinates(vertices)
    .unwrap()
}

/// Write a SCRIP-style grid-definition file for a vertex set.
fn write_grid_file(path: &Path, vertices: &GridVertexSet) -> Result<()> {
    let (ny, nx) = vertices.shape();
    let mut file = create(path)?;
    file.add_dimension("y", ny)?;
    file.add_dimension("x", nx)?;
    file.add_dimension("corner", 4)?;

    let mut var = file.add_variable::<f64>("grid_center_lat", &["y", "x"])?;
    var.put(vertices.center_lat.view(), ..)?;
    let mut var = file.add_variable::<f64>("grid_center_lon", &["y", "x"])?;
    var.put(vertices.center_lon.view(), ..)?;
    let mut var = file.add_variable::<f64>("grid_corner_lat", &["y", "x", "corner"])?;
    var.put(vertices.corner_lat.view(), ..)?;
    let mut var = file.add_variable::<f64>("grid_corner_lon", &["y", "x", "corner"])?;
    var.put(vertices.corner_lon.view(), ..)?;
    Ok(())
}

#[test]
fn test_grid_loader_shapes() -> Result<()> {
    let temp_dir = tempdir().expect("Failed to create temp dir");
    let path = temp_dir.path().join("grid.nc");
    let vertices = synthetic_vertices(6, 10, -30.0, 30.0, 0.0, 100.0);
    write_grid_file(&path, &vertices)?;

    let loaded = load_grid_vertices(&path)?;
    let (ny, nx) = loaded.shape();
    assert_eq!((ny, nx), (6, 10));
    assert_eq!(loaded.corner_lat.dim(), (ny, nx, 4));
    assert_eq!(loaded.corner_lon.dim(), (ny, nx, 4));
    assert!((loaded.center_lat[[0, 0]] - vertices.center_lat[[0, 0]]).abs() < 1e-12);
    assert!((loaded.corner_lon[[5, 9, 2]] - vertices.corner_lon[[5, 9, 2]]).abs() < 1e-12);
    Ok(())
}

#[test]
fn test_grid_loader_synonyms_and_permuted_corners() -> Result<()> {
    let temp_dir = tempdir().expect("Failed to create temp dir");
    let path = temp_dir.path().join("mesh.nc");
    let vertices = synthetic_vertices(5, 6, 0.0, 10.0, 0.0, 12.0);

    // NEMO-style names, corner axis leading
    {
        let mut file = create(&path)?;
        file.add_dimension("corner", 4)?;
        file.add_dimension("y", 5)?;
        file.add_dimension("x", 6)?;

        let mut var = file.add_variable::<f64>("nav_lat", &["y", "x"])?;
        var.put(vertices.center_lat.view(), ..)?;
        let mut var = file.add_variable::<f64>("nav_lon", &["y", "x"])?;
        var.put(vertices.center_lon.view(), ..)?;

        let mut permuted_lat = Array3::zeros((4, 5, 6));
        let mut permuted_lon = Array3::zeros((4, 5, 6));
        for ((iy, ix, k), &v) in vertices.corner_lat.indexed_iter() {
            permuted_lat[[k, iy, ix]] = v;
        }
        for ((iy, ix, k), &v) in vertices.corner_lon.indexed_iter() {
            permuted_lon[[k, iy, ix]] = v;
        }
        let mut var = file.add_variable::<f64>("bounds_nav_lat", &["corner", "y", "x"])?;
        var.put(permuted_lat.view(), ..)?;
        let mut var = file.add_variable::<f64>("bounds_nav_lon", &["corner", "y", "x"])?;
        var.put(permuted_lon.view(), ..)?;
    }

    let loaded = load_grid_vertices(&path)?;
    assert_eq!(loaded.shape(), (5, 6));
    assert_eq!(loaded.corner_lat.dim(), (5, 6, 4));
    assert!((loaded.corner_lat[[2, 3, 1]] - vertices.corner_lat[[2, 3, 1]]).abs() < 1e-12);
    Ok(())
}

#[test]
fn test_grid_loader_missing_fields() -> Result<()> {
    let temp_dir = tempdir().expect("Failed to create temp dir");
    let path = temp_dir.path().join("broken.nc");
    let vertices = synthetic_vertices(4, 4, 0.0, 4.0, 0.0, 4.0);
    {
        let mut file = create(&path)?;
        file.add_dimension("y", 4)?;
        file.add_dimension("x", 4)?;
        let mut var = file.add_variable::<f64>("grid_center_lat", &["y", "x"])?;
        var.put(vertices.center_lat.view(), ..)?;
    }

    match load_grid_vertices(&path) {
        Err(RegridError::FileFormat { reason, .. }) => {
            assert!(reason.contains("none of the expected fields"));
        }
        other => panic!("expected FileFormat error, got {:?}", other.map(|v| v.shape())),
    }
    Ok(())
}

#[test]
fn test_grid_loader_nonexistent_file() {
    let result = load_grid_vertices(Path::new("/nonexistent/grid.nc"));
    assert!(matches!(result, Err(RegridError::FileFormat { .. })));
}

#[test]
fn test_regional_regrid_leaves_uncovered_cells_missing() -> Result<()> {
    let vertices = synthetic_vertices(20, 20, 0.0, 20.0, 0.0, 20.0);
    let dataset = dataset_on(&vertices, |lat, lon| 1.0 + (lat + lon) as f32);

    let config = RegridConfig::new(8, RegridMethod::Bilinear);
    let cells = regrid_to_dggs(&dataset, &vertices, &config)?;

    assert_eq!(cells.data.len(), 768);
    let finite = cells.populated();
    let missing = cells.data.iter().filter(|v| v.is_nan()).count();
    assert!(finite > 0, "some cells over the domain must be populated");
    assert!(missing > 0, "cells outside the regional domain must be missing");
    assert_eq!(finite + missing, 768);

    // The source field is everywhere >= 1; uncovered cells must be NaN,
    // never silently zero
    for &v in cells.data.iter() {
        assert!(v.is_nan() || v >= 1.0, "unexpected value {}", v);
    }
    Ok(())
}

#[test]
fn test_min_vertices_threshold_is_monotone() -> Result<()> {
    let vertices = synthetic_vertices(20, 20, 0.0, 20.0, 0.0, 20.0);
    let dataset = dataset_on(&vertices, |lat, _| 1.0 + lat as f32);

    let liberal = regrid_to_dggs(
        &dataset,
        &vertices,
        &RegridConfig::new(8, RegridMethod::Nearest).with_min_vertices(1),
    )?;
    let strict = regrid_to_dggs(
        &dataset,
        &vertices,
        &RegridConfig::new(8, RegridMethod::Nearest).with_min_vertices(4),
    )?;

    assert!(strict.populated() <= liberal.populated());
    Ok(())
}

#[test]
fn test_conservative_preserves_integral() -> Result<()> {
    let vertices = synthetic_vertices(24, 48, -90.0, 90.0, 0.0, 360.0);
    let dataset = dataset_on(&vertices, |lat, _| 2.0 + lat.to_radians().sin() as f32);

    let config = RegridConfig::new(8, RegridMethod::Conservative);
    let cells = regrid_to_dggs(&dataset, &vertices, &config)?;

    let mut source_integral = 0.0f64;
    for iy in 0..24 {
        for ix in 0..48 {
            source_integral +=
                vertices.cell_area(iy, ix) * dataset.data[[iy, ix]] as f64;
        }
    }

    let pixel_area = 4.0 * std::f64::consts::PI / cells.npix() as f64;
    let target_integral: f64 = cells
        .data
        .iter()
        .filter(|v| v.is_finite())
        .map(|&v| v as f64 * pixel_area)
        .sum();

    let rel_err = (source_integral - target_integral).abs() / source_integral.abs();
    assert!(
        rel_err < 0.05,
        "integral not preserved: source {} target {} rel_err {}",
        source_integral,
        target_integral,
        rel_err
    );
    Ok(())
}

#[test]
fn test_nearest_preserves_constant_field() -> Result<()> {
    let vertices = synthetic_vertices(24, 48, -90.0, 90.0, 0.0, 360.0);
    let dataset = dataset_on(&vertices, |_, _| 3.5);

    let config = RegridConfig::new(8, RegridMethod::Nearest);
    let cells = regrid_to_dggs(&dataset, &vertices, &config)?;

    assert_eq!(cells.populated(), cells.npix());
    for &v in cells.data.iter() {
        assert_eq!(v, 3.5);
    }
    Ok(())
}

#[test]
fn test_mask_excludes_source_cells() -> Result<()> {
    let vertices = synthetic_vertices(10, 10, 0.0, 10.0, 0.0, 10.0);
    let dataset = dataset_on(&vertices, |_, _| 1.0);

    let config = RegridConfig::new(4, RegridMethod::Bilinear)
        .with_mask(Array2::from_elem((10, 10), false));
    let cells = regrid_to_dggs(&dataset, &vertices, &config)?;

    assert_eq!(cells.populated(), 0, "fully masked source must produce no cells");
    Ok(())
}

#[test]
fn test_zarr_roundtrip() -> Result<()> {
    let temp_dir = tempdir().expect("Failed to create temp dir");
    let vertices = synthetic_vertices(20, 20, 0.0, 20.0, 0.0, 20.0);
    let dataset = dataset_on(&vertices, |lat, lon| (lat * 2.0 + lon) as f32);

    let config = RegridConfig::new(4, RegridMethod::Bilinear);
    let cells = regrid_to_dggs(&dataset, &vertices, &config)?;

    let store = write_healpix_store(temp_dir.path(), &cells)?;
    assert!(store.ends_with("u236-healpix-lvl-2.zarr"));
    assert!(store.join("u236").join(".zarray").exists());

    let read_back = read_healpix_store(&store, "u236")?;
    assert_eq!(read_back.nside, 4);
    assert_eq!(read_back.data.shape(), cells.data.shape());
    assert_eq!(read_back.dims, vec!["cell"]);
    for (a, b) in cells.data.iter().zip(read_back.data.iter()) {
        assert!(
            (a.is_nan() && b.is_nan()) || a == b,
            "round-trip mismatch: {} vs {}",
            a,
            b
        );
    }

    let cell_ids = read_cell_ids(&store)?;
    assert_eq!(cell_ids.len(), 192);
    assert_eq!(cell_ids, (0..192).collect::<Vec<i64>>());
    Ok(())
}

#[test]
fn test_regrid_difference_diagnostic() -> Result<()> {
    let vertices = synthetic_vertices(24, 48, -90.0, 90.0, 0.0, 360.0);
    let dataset = dataset_on(&vertices, |lat, _| 2.0 + lat.to_radians().sin() as f32);

    let bilinear = regrid_to_dggs(
        &dataset,
        &vertices,
        &RegridConfig::new(8, RegridMethod::Bilinear),
    )?;
    let conservative = regrid_to_dggs(
        &dataset,
        &vertices,
        &RegridConfig::new(8, RegridMethod::Conservative),
    )?;

    let diff = regrid_difference(&bilinear, &conservative)?;
    assert_eq!(diff.shape(), bilinear.data.shape());
    assert!(diff.iter().any(|v| v.is_finite()));

    // Mismatched resolutions cannot be differenced
    let coarse = regrid_to_dggs(
        &dataset,
        &vertices,
        &RegridConfig::new(4, RegridMethod::Bilinear),
    )?;
    assert!(regrid_difference(&bilinear, &coarse).is_err());
    Ok(())
}

#[test]
fn test_full_pipeline_from_netcdf() -> Result<()> {
    let temp_dir = tempdir().expect("Failed to create temp dir");
    let source_path = temp_dir.path().join("u236.nc");
    let grid_path = temp_dir.path().join("grid.nc");
    let out_dir = temp_dir.path().join("out");
    std::fs::create_dir_all(&out_dir)?;

    let (ny, nx) = (12, 24);
    let vertices = synthetic_vertices(ny, nx, -30.0, 30.0, 0.0, 120.0);
    write_grid_file(&grid_path, &vertices)?;

    // Model output: (time, depth, y, x) with the land corner filled
    let fill = -999.0f32;
    let mut values = Vec::new();
    for t in 0..2usize {
        for d in 0..3usize {
            for iy in 0..ny {
                for ix in 0..nx {
                    if iy < 2 && ix < 2 {
                        values.push(fill);
                    } else {
                        values.push(1.0 + t as f32 + d as f32 * 0.1 + (iy + ix) as f32 * 0.01);
                    }
                }
            }
        }
    }
    {
        let mut file = create(&source_path)?;
        file.add_dimension("time_counter", 2)?;
        file.add_dimension("deptht", 3)?;
        file.add_dimension("yt", ny)?;
        file.add_dimension("xt", nx)?;

        let mut var =
            file.add_variable::<f32>("u236", &["time_counter", "deptht", "yt", "xt"])?;
        var.put_attribute("_FillValue", fill)?;
        var.put_attribute("units", "mol/kg")?;
        let arr = ArrayD::from_shape_vec(vec![2, 3, ny, nx], values)?;
        var.put(arr.view(), ..)?;
    }

    let dataset = open_dataset(&source_path, "u236")?.with_coordinates(&vertices)?;
    assert_eq!(dataset.fill_value, Some(fill));
    // Fill values are loaded as NaN
    assert!(dataset.data[[0, 0, 0, 0]].is_nan());
    assert!(dataset.data[[0, 0, 5, 5]].is_finite());

    let dataset = standardize(dataset)?;
    assert_eq!(dataset.dims, vec!["time", "depth", "y", "x"]);
    assert_eq!(dataset.attrs.get("units").map(String::as_str), Some("mol/kg"));

    let config = RegridConfig::new(4, RegridMethod::Conservative);
    let cells = regrid_to_dggs(&dataset, &vertices, &config)?;
    assert_eq!(cells.data.shape(), &[2, 3, 192]);
    assert_eq!(cells.dims, vec!["time", "depth", "cell"]);
    assert_eq!(
        cells.attrs.get("healpix_order").map(String::as_str),
        Some("ring")
    );
    assert!(cells.populated() > 0);

    let store = write_healpix_store(&out_dir, &cells)?;
    assert!(store.ends_with("u236-healpix-lvl-2.zarr"));

    let read_back = read_healpix_store(&store, "u236")?;
    assert_eq!(read_back.data.shape(), &[2, 3, 192]);
    assert_eq!(read_back.dims, vec!["time", "depth", "cell"]);
    assert_eq!(
        read_back.attrs.get("regrid_method").map(String::as_str),
        Some("conservative")
    );
    for (a, b) in cells.data.iter().zip(read_back.data.iter()) {
        assert!((a.is_nan() && b.is_nan()) || a == b);
    }
    Ok(())
}
