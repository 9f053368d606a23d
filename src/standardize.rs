//! Canonical variable and dimension naming
//!
//! Model families disagree on dimension and coordinate names
//! (`lon`/`longitude`/`nav_lon`, `deptht`/`lev`/`st_ocean`, ...). The
//! standardizer remaps a loaded dataset onto one canonical vocabulary so
//! the regridder and downstream consumers can introspect by name, and
//! fills in the CF-style `standard_name`/`units`/`coordinates`
//! attributes they expect.
//!
//! The transform is idempotent: canonical names map to themselves.

use crate::dataset::GridDataset;
use crate::errors::{RegridError, Result};

/// Synonym table; the first entry of each row is the canonical name.
const DIM_SYNONYMS: &[(&str, &[&str])] = &[
    ("time", &["time", "time_counter", "time_centered", "t"]),
    ("depth", &["depth", "deptht", "lev", "z_l", "st_ocean", "olevel"]),
    ("y", &["y", "yt", "nlat", "nj", "y_grid_T", "lat", "latitude"]),
    ("x", &["x", "xt", "nlon", "ni", "x_grid_T", "lon", "longitude"]),
];

/// CF standard names for known tracer/coordinate variables.
const STANDARD_NAMES: &[(&str, &str)] = &[
    ("u236", "moles_of_uranium_236_per_unit_mass_in_sea_water"),
    ("lat", "latitude"),
    ("lon", "longitude"),
    ("time", "time"),
    ("depth", "depth"),
];

/// Canonical form of a dimension name, if the name (or a synonym) is known.
pub fn canonical_dim_name(name: &str) -> Option<&'static str> {
    let lowered = name.to_ascii_lowercase();
    DIM_SYNONYMS.iter().find_map(|(canonical, synonyms)| {
        synonyms
            .iter()
            .any(|s| s.eq_ignore_ascii_case(&lowered))
            .then_some(*canonical)
    })
}

/// Remap a dataset's dimension names and attributes to the canonical scheme.
///
/// The trailing two dimensions must resolve to `y` and `x`; a dimension
/// that matches no synonym fails with a missing-field error. Leading
/// dimensions with no synonym match would be ambiguous, so they fail too.
pub fn standardize(mut dataset: GridDataset) -> Result<GridDataset> {
    let ndim = dataset.dims.len();
    if ndim < 2 {
        return Err(RegridError::Generic(format!(
            "Variable '{}' has {} dimension(s); at least (y, x) required",
            dataset.name, ndim
        )));
    }

    let mut renamed = Vec::with_capacity(ndim);
    for (i, dim) in dataset.dims.iter().enumerate() {
        let canonical =
            canonical_dim_name(dim).ok_or_else(|| RegridError::MissingField {
                field: dim.clone(),
            })?;
        // The spatial axes must land on y then x; a time dimension in the
        // trailing slots means the variable is not spatially gridded.
        let expected = match ndim - i {
            1 => Some("x"),
            2 => Some("y"),
            _ => None,
        };
        if let Some(expected) = expected {
            if canonical != expected {
                return Err(RegridError::Generic(format!(
                    "Dimension '{}' of variable '{}' resolved to '{}', expected '{}'",
                    dim, dataset.name, canonical, expected
                )));
            }
        }
        renamed.push(canonical.to_string());
    }
    dataset.dims = renamed;

    if !dataset.attrs.contains_key("standard_name") {
        let standard = STANDARD_NAMES
            .iter()
            .find(|(var, _)| var.eq_ignore_ascii_case(&dataset.name))
            .map(|(_, std)| std.to_string())
            .unwrap_or_else(|| dataset.name.to_ascii_lowercase());
        dataset.attrs.insert("standard_name".to_string(), standard);
    }
    dataset
        .attrs
        .entry("units".to_string())
        .or_insert_with(|| "1".to_string());
    dataset
        .attrs
        .insert("coordinates".to_string(), "lat lon".to_string());

    Ok(dataset)
}
