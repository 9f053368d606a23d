//! Labeled-array dataset loading
//!
//! This module provides [`GridDataset`], the in-memory form of one model
//! variable: an n-dimensional `f32` array with named dimensions, string
//! attributes and (after attachment) 2-D latitude/longitude coordinate
//! arrays covering the trailing `(y, x)` dimensions.

use crate::errors::{RegridError, Result};
use crate::grid::GridVertexSet;
use ndarray::{Array2, ArrayD};
use netcdf::{AttributeValue, File};
use std::collections::HashMap;
use std::path::Path;

/// One model variable loaded from a gridded-array file.
///
/// The trailing two dimensions are the spatial `(y, x)` grid; any leading
/// dimensions (time, vertical level) are carried through regridding
/// unchanged. Values equal to the variable's fill value are loaded as NaN.
#[derive(Debug, Clone)]
pub struct GridDataset {
    /// Variable name as found in the source file
    pub name: String,
    /// Data with fill values replaced by NaN
    pub data: ArrayD<f32>,
    /// Dimension names, one per axis of `data`
    pub dims: Vec<String>,
    /// Cell-center latitude over `(y, x)`, attached from a [`GridVertexSet`]
    pub lat: Option<Array2<f64>>,
    /// Cell-center longitude over `(y, x)`
    pub lon: Option<Array2<f64>>,
    /// Variable attributes, stringified
    pub attrs: HashMap<String, String>,
    /// Original fill value, if the variable declared one
    pub fill_value: Option<f32>,
}

impl GridDataset {
    /// Spatial `(y, x)` shape, i.e. the trailing two dimensions.
    pub fn spatial_shape(&self) -> Result<(usize, usize)> {
        let shape = self.data.shape();
        if shape.len() < 2 {
            return Err(RegridError::Generic(format!(
                "Variable '{}' has {} dimension(s); at least (y, x) required",
                self.name,
                shape.len()
            )));
        }
        Ok((shape[shape.len() - 2], shape[shape.len() - 1]))
    }

    /// Number of slices formed by the leading (non-spatial) dimensions.
    ///
    /// A plain `(y, x)` variable has one slice; a zero-length leading
    /// dimension (e.g. an unlimited record dimension with no records)
    /// has none.
    pub fn outer_len(&self) -> usize {
        let shape = self.data.shape();
        shape[..shape.len() - 2].iter().product()
    }

    /// Attach cell-center coordinates from a grid-definition vertex set.
    ///
    /// The vertex arrays must match the variable's `(y, x)` shape.
    pub fn with_coordinates(mut self, vertices: &GridVertexSet) -> Result<Self> {
        let (ny, nx) = self.spatial_shape()?;
        if vertices.center_lat.dim() != (ny, nx) {
            return Err(RegridError::Generic(format!(
                "Grid vertex shape {:?} does not match variable '{}' spatial shape ({}, {})",
                vertices.center_lat.dim(),
                self.name,
                ny,
                nx
            )));
        }
        self.lat = Some(vertices.center_lat.clone());
        self.lon = Some(vertices.center_lon.clone());
        Ok(self)
    }
}

/// Load one variable from a NetCDF file into a [`GridDataset`].
///
/// Reads the full data array as `f32`, replaces declared fill values
/// (`_FillValue` or `missing_value`) with NaN and stringifies the
/// variable attributes.
pub fn open_dataset(path: &Path, var_name: &str) -> Result<GridDataset> {
    let file = netcdf::open(path)?;
    load_variable(&file, var_name)
}

/// Load one variable from an already-open NetCDF file.
pub fn load_variable(file: &File, var_name: &str) -> Result<GridDataset> {
    let var = file
        .variable(var_name)
        .ok_or_else(|| RegridError::MissingField {
            field: var_name.to_string(),
        })?;

    let dims: Vec<String> = var
        .dimensions()
        .iter()
        .map(|d| d.name().to_string())
        .collect();
    let shape: Vec<usize> = var.dimensions().iter().map(|d| d.len()).collect();

    let data_vec = var.get_values::<f32, _>(..)?;
    let mut data = ArrayD::from_shape_vec(shape, data_vec)?;

    let fill_value = read_fill_value(&var);
    if let Some(fv) = fill_value {
        data.mapv_inplace(|x| if x == fv { f32::NAN } else { x });
    }

    let mut attrs = HashMap::new();
    for attr in var.attributes() {
        if let Ok(value) = attr.value() {
            if let Some(s) = attribute_to_string(&value) {
                attrs.insert(attr.name().to_string(), s);
            }
        }
    }

    Ok(GridDataset {
        name: var_name.to_string(),
        data,
        dims,
        lat: None,
        lon: None,
        attrs,
        fill_value,
    })
}

fn read_fill_value(var: &netcdf::Variable) -> Option<f32> {
    for name in ["_FillValue", "missing_value"] {
        let value = var.attribute(name).and_then(|attr| match attr.value().ok()? {
            AttributeValue::Float(v) => Some(v),
            AttributeValue::Double(v) => Some(v as f32),
            AttributeValue::Short(v) => Some(v as f32),
            AttributeValue::Int(v) => Some(v as f32),
            _ => None,
        });
        if value.is_some() {
            return value;
        }
    }
    None
}

/// Render a NetCDF attribute as a plain string, or None for unsupported types.
pub fn attribute_to_string(value: &AttributeValue) -> Option<String> {
    match value {
        AttributeValue::Str(s) => Some(s.clone()),
        AttributeValue::Strs(ss) => Some(ss.join(", ")),
        AttributeValue::Float(v) => Some(v.to_string()),
        AttributeValue::Double(v) => Some(v.to_string()),
        AttributeValue::Int(v) => Some(v.to_string()),
        AttributeValue::Short(v) => Some(v.to_string()),
        AttributeValue::Uchar(v) => Some(v.to_string()),
        _ => None,
    }
}
