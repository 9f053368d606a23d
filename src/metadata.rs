//! NetCDF metadata inspection
//!
//! Helpers for examining an input file before regridding: listing
//! variables and dimensions, and describing a single variable's shape
//! and attributes.

use crate::dataset::attribute_to_string;
use crate::errors::{RegridError, Result};
use netcdf::File;

/// Lists all variables and dimensions in a clean, organized format.
pub fn list_variables_and_dimensions(file: &File) -> Result<()> {
    println!("\n Dimensions");
    println!("==============");

    let mut dimensions: Vec<_> = file.dimensions().collect();
    dimensions.sort_by(|a, b| a.name().cmp(&b.name()));

    if dimensions.is_empty() {
        println!("   (No dimensions found)");
    } else {
        for dim in dimensions {
            let length_info = if dim.is_unlimited() {
                format!("{} (unlimited)", dim.len())
            } else {
                dim.len().to_string()
            };
            println!("    {} = {}", dim.name(), length_info);
        }
    }

    println!("\n Variables");
    println!("=============");

    let mut variables: Vec<_> = file.variables().collect();
    variables.sort_by(|a, b| a.name().cmp(&b.name()));

    if variables.is_empty() {
        println!("   (No variables found)");
    } else {
        for var in variables {
            let data_type = format!("{:?}", var.vartype()).to_lowercase();

            let dims: Vec<String> = var
                .dimensions()
                .iter()
                .map(|d| d.name().to_string())
                .collect();
            let shape: Vec<String> = var
                .dimensions()
                .iter()
                .map(|d| d.len().to_string())
                .collect();

            if dims.is_empty() {
                println!("    {} ({}): scalar", var.name(), data_type);
            } else {
                println!(
                    "    {} ({}): [{}] = ({})",
                    var.name(),
                    data_type,
                    dims.join(", "),
                    shape.join(" x ")
                );
            }

            let mut key_attrs = Vec::new();
            for name in ["units", "long_name", "standard_name"] {
                if let Some(attr) = var.attribute(name) {
                    if let Ok(value) = attr.value() {
                        if let Some(s) = attribute_to_string(&value) {
                            key_attrs.push(format!("{}: {}", name, s));
                        }
                    }
                }
            }
            if !key_attrs.is_empty() {
                println!("       {}", key_attrs.join(", "));
            }
        }
    }

    Ok(())
}

/// Describes a specific variable showing its data type, shape, and attributes.
pub fn describe_variable(file: &File, var_name: &str) -> Result<()> {
    let var = file
        .variable(var_name)
        .ok_or_else(|| RegridError::MissingField {
            field: var_name.to_string(),
        })?;

    println!("\n Variable Description: {}", var_name);
    println!("={}", "=".repeat(var_name.len() + 25));

    let data_type = format!("{:?}", var.vartype()).to_lowercase();
    println!(" Data type: {}", data_type);

    let dims: Vec<String> = var
        .dimensions()
        .iter()
        .map(|d| d.name().to_string())
        .collect();
    let shape: Vec<usize> = var.dimensions().iter().map(|dim| dim.len()).collect();

    if dims.is_empty() {
        println!(" Dimensions: (scalar)");
        println!(" Shape: ()");
    } else {
        println!(" Dimensions: [{}]", dims.join(", "));
        println!(
            " Shape: ({})",
            shape
                .iter()
                .map(|s| s.to_string())
                .collect::<Vec<_>>()
                .join(" x ")
        );
    }

    let attributes: Vec<_> = var.attributes().collect();
    if attributes.is_empty() {
        println!("\n  Attributes: (none)");
    } else {
        println!("\n  Attributes:");
        for attr in attributes {
            match attr.value() {
                Ok(value) => match attribute_to_string(&value) {
                    Some(s) => println!("   - {}: {}", attr.name(), s),
                    None => println!("   - {}: {:?}", attr.name(), value),
                },
                Err(e) => println!("   - {}: (error reading value: {})", attr.name(), e),
            }
        }
    }

    Ok(())
}
