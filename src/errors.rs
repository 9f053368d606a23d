//! Centralized error handling for the regridding pipeline
//!
//! This module provides structured error types instead of a generic
//! `Box<dyn Error>`, so each pipeline stage can report what failed and
//! callers can match on the failure kind.

use std::fmt;

/// Main error type for regridding operations
#[derive(Debug)]
pub enum RegridError {
    /// NetCDF file operation errors
    NetCDFError(netcdf::Error),

    /// I/O operation errors
    IoError(std::io::Error),

    /// Malformed or incomplete input file (e.g. grid-definition file
    /// without vertex fields)
    FileFormat { path: String, reason: String },

    /// Expected variable or coordinate absent and no synonym matched
    MissingField { field: String },

    /// Invalid regrid configuration (bad nside, method, coverage threshold)
    InvalidParameter { message: String },

    /// Zarr store operation errors
    ZarrError(String),

    /// Thread pool configuration error
    ThreadPoolError(String),

    /// Array shape or dimension error
    ArrayError(ndarray::ShapeError),

    /// Generic error
    Generic(String),
}

impl fmt::Display for RegridError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RegridError::NetCDFError(e) => write!(f, "NetCDF error: {}", e),
            RegridError::IoError(e) => write!(f, "I/O error: {}", e),
            RegridError::FileFormat { path, reason } => {
                write!(f, "Malformed input file '{}': {}", path, reason)
            }
            RegridError::MissingField { field } => {
                write!(f, "Field '{}' not found and no synonym matched", field)
            }
            RegridError::InvalidParameter { message } => {
                write!(f, "Invalid regrid parameter: {}", message)
            }
            RegridError::ZarrError(msg) => write!(f, "Zarr store error: {}", msg),
            RegridError::ThreadPoolError(msg) => write!(f, "Thread pool error: {}", msg),
            RegridError::ArrayError(e) => write!(f, "Array error: {}", e),
            RegridError::Generic(msg) => write!(f, "{}", msg),
        }
    }
}

impl std::error::Error for RegridError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            RegridError::NetCDFError(e) => Some(e),
            RegridError::IoError(e) => Some(e),
            RegridError::ArrayError(e) => Some(e),
            _ => None,
        }
    }
}

impl From<netcdf::Error> for RegridError {
    fn from(error: netcdf::Error) -> Self {
        RegridError::NetCDFError(error)
    }
}

impl From<std::io::Error> for RegridError {
    fn from(error: std::io::Error) -> Self {
        RegridError::IoError(error)
    }
}

impl From<ndarray::ShapeError> for RegridError {
    fn from(error: ndarray::ShapeError) -> Self {
        RegridError::ArrayError(error)
    }
}

impl From<String> for RegridError {
    fn from(error: String) -> Self {
        RegridError::Generic(error)
    }
}

impl From<&str> for RegridError {
    fn from(error: &str) -> Self {
        RegridError::Generic(error.to_string())
    }
}

/// Result type alias for regridding operations
pub type Result<T> = std::result::Result<T, RegridError>;
