//! Chunked array store I/O
//!
//! Persists regridded datasets to a Zarr-v2-style directory hierarchy:
//! a group with one array per field, each array a directory holding
//! `.zarray`/`.zattrs` JSON metadata and little-endian binary chunk
//! files with dotted chunk keys. Chunking is along the cell dimension
//! (12 chunks of nside^2 cells, which always divides the cell count);
//! the fill value is NaN so missing cells read back as missing, never
//! as zero.
//!
//! Store naming follows the `<variable>-healpix-lvl-<level>.zarr`
//! convention.

use crate::errors::{RegridError, Result};
use crate::regrid::HealpixDataset;
use chrono::Utc;
use ndarray::ArrayD;
use rayon::prelude::*;
use serde_json::{json, Value as JsonValue};
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

/// Write a regridded dataset to `<out_dir>/<variable>-healpix-lvl-<level>.zarr`.
///
/// The store holds the data array under the variable name plus a `cell`
/// array with the ring-scheme cell ids. An existing store at the same
/// path is replaced. Returns the store path.
pub fn write_healpix_store(out_dir: &Path, dataset: &HealpixDataset) -> Result<PathBuf> {
    let store = out_dir.join(dataset.store_name());
    if store.exists() {
        fs::remove_dir_all(&store)?;
    }
    fs::create_dir_all(&store)?;
    fs::write(store.join(".zgroup"), "{\"zarr_format\": 2}")?;

    let npix = dataset.npix();
    let cell_chunk = (npix / 12).max(1);

    let mut attrs = dataset.attrs.clone();
    attrs.insert(
        "history".to_string(),
        format!("Created by healpix_regrid on {}", Utc::now().to_rfc3339()),
    );
    write_f32_array(
        &store,
        &dataset.name,
        &dataset.data,
        &dataset.dims,
        cell_chunk,
        &attrs,
    )?;

    let cell_ids: Vec<i64> = (0..npix as i64).collect();
    write_cell_array(&store, &cell_ids)?;

    Ok(store)
}

/// Read a store written by [`write_healpix_store`] back into memory.
pub fn read_healpix_store(store: &Path, var_name: &str) -> Result<HealpixDataset> {
    let (data, dims, attrs) = read_f32_array(&store.join(var_name))?;
    let nside: usize = attrs
        .get("healpix_nside")
        .and_then(|s| s.parse().ok())
        .ok_or_else(|| {
            RegridError::ZarrError(format!(
                "store '{}' lacks a healpix_nside attribute",
                store.display()
            ))
        })?;
    Ok(HealpixDataset {
        name: var_name.to_string(),
        nside,
        data,
        dims,
        attrs,
    })
}

/// Read the ring-scheme cell ids of a store.
pub fn read_cell_ids(store: &Path) -> Result<Vec<i64>> {
    let array_path = store.join("cell");
    let meta = read_array_metadata(&array_path)?;
    let npix: usize = meta.shape.iter().product();
    let bytes = fs::read(array_path.join("0"))?;
    if bytes.len() != npix * 8 {
        return Err(RegridError::ZarrError(format!(
            "cell array chunk has {} bytes, expected {}",
            bytes.len(),
            npix * 8
        )));
    }
    Ok(bytes
        .chunks_exact(8)
        .map(|b| i64::from_le_bytes([b[0], b[1], b[2], b[3], b[4], b[5], b[6], b[7]]))
        .collect())
}

fn write_f32_array(
    store: &Path,
    name: &str,
    data: &ArrayD<f32>,
    dims: &[String],
    cell_chunk: usize,
    attrs: &HashMap<String, String>,
) -> Result<()> {
    let array_path = store.join(name);
    fs::create_dir_all(&array_path)?;

    let shape = data.shape().to_vec();
    let ndim = shape.len();
    let mut chunks = shape.clone();
    chunks[ndim - 1] = cell_chunk;

    let metadata = json!({
        "chunks": chunks,
        "compressor": null,
        "dtype": "<f4",
        "fill_value": "NaN",
        "filters": null,
        "order": "C",
        "shape": shape,
        "zarr_format": 2
    });
    fs::write(
        array_path.join(".zarray"),
        serde_json::to_string_pretty(&metadata)
            .map_err(|e| RegridError::ZarrError(e.to_string()))?,
    )?;

    let mut zattrs: serde_json::Map<String, JsonValue> = attrs
        .iter()
        .map(|(k, v)| (k.clone(), JsonValue::String(v.clone())))
        .collect();
    zattrs.insert(
        "_ARRAY_DIMENSIONS".to_string(),
        JsonValue::Array(dims.iter().map(|d| JsonValue::String(d.clone())).collect()),
    );
    fs::write(
        array_path.join(".zattrs"),
        serde_json::to_string_pretty(&JsonValue::Object(zattrs))
            .map_err(|e| RegridError::ZarrError(e.to_string()))?,
    )?;

    let src = data.as_slice().ok_or_else(|| {
        RegridError::ZarrError("array is not in standard layout".to_string())
    })?;
    let npix = shape[ndim - 1];
    let outer: usize = shape[..ndim - 1].iter().product::<usize>().max(1);
    let num_chunks = npix.div_ceil(cell_chunk);

    // Leading dimensions are one chunk each, so a chunk key is all zeros
    // followed by the cell-chunk index. Chunks fan out across the pool.
    (0..num_chunks).into_par_iter().try_for_each(|c| {
        let c0 = c * cell_chunk;
        let clen = cell_chunk.min(npix - c0);
        let mut bytes = Vec::with_capacity(outer * cell_chunk * 4);
        for t in 0..outer {
            for &v in &src[t * npix + c0..t * npix + c0 + clen] {
                bytes.extend_from_slice(&v.to_le_bytes());
            }
            // Pad edge chunks with the fill value
            for _ in clen..cell_chunk {
                bytes.extend_from_slice(&f32::NAN.to_le_bytes());
            }
        }
        let key = chunk_key(ndim, c);
        fs::write(array_path.join(key), bytes).map_err(RegridError::IoError)
    })?;

    Ok(())
}

fn write_cell_array(store: &Path, cell_ids: &[i64]) -> Result<()> {
    let array_path = store.join("cell");
    fs::create_dir_all(&array_path)?;

    let metadata = json!({
        "chunks": [cell_ids.len()],
        "compressor": null,
        "dtype": "<i8",
        "fill_value": null,
        "filters": null,
        "order": "C",
        "shape": [cell_ids.len()],
        "zarr_format": 2
    });
    fs::write(
        array_path.join(".zarray"),
        serde_json::to_string_pretty(&metadata)
            .map_err(|e| RegridError::ZarrError(e.to_string()))?,
    )?;
    fs::write(
        array_path.join(".zattrs"),
        "{\n  \"_ARRAY_DIMENSIONS\": [\"cell\"]\n}",
    )?;

    let bytes: Vec<u8> = cell_ids.iter().flat_map(|v| v.to_le_bytes()).collect();
    fs::write(array_path.join("0"), bytes)?;
    Ok(())
}

fn chunk_key(ndim: usize, cell_chunk_index: usize) -> String {
    let mut parts = vec!["0".to_string(); ndim - 1];
    parts.push(cell_chunk_index.to_string());
    parts.join(".")
}

struct ParsedArrayMetadata {
    shape: Vec<usize>,
    chunks: Vec<usize>,
    dtype: String,
}

fn read_array_metadata(array_path: &Path) -> Result<ParsedArrayMetadata> {
    let zarray_path = array_path.join(".zarray");
    let content = fs::read_to_string(&zarray_path).map_err(|_| {
        RegridError::ZarrError(format!(
            "array metadata not found at {}",
            zarray_path.display()
        ))
    })?;
    let meta: JsonValue = serde_json::from_str(&content)
        .map_err(|e| RegridError::ZarrError(format!("cannot parse .zarray: {}", e)))?;

    let usize_list = |key: &str| -> Result<Vec<usize>> {
        meta[key]
            .as_array()
            .ok_or_else(|| RegridError::ZarrError(format!("missing '{}' in .zarray", key)))?
            .iter()
            .map(|v| {
                v.as_u64()
                    .map(|u| u as usize)
                    .ok_or_else(|| RegridError::ZarrError(format!("bad '{}' entry", key)))
            })
            .collect()
    };

    Ok(ParsedArrayMetadata {
        shape: usize_list("shape")?,
        chunks: usize_list("chunks")?,
        dtype: meta["dtype"].as_str().unwrap_or("unknown").to_string(),
    })
}

fn read_f32_array(
    array_path: &Path,
) -> Result<(ArrayD<f32>, Vec<String>, HashMap<String, String>)> {
    let meta = read_array_metadata(array_path)?;
    if meta.dtype != "<f4" {
        return Err(RegridError::ZarrError(format!(
            "unsupported dtype '{}' (expected <f4)",
            meta.dtype
        )));
    }

    let total: usize = meta.shape.iter().product();
    let mut flat = vec![f32::NAN; total];

    // Strides of the full array and chunk counts per dimension
    let ndim = meta.shape.len();
    let mut strides = vec![1usize; ndim];
    for i in (0..ndim.saturating_sub(1)).rev() {
        strides[i] = strides[i + 1] * meta.shape[i + 1];
    }
    let grid: Vec<usize> = meta
        .shape
        .iter()
        .zip(&meta.chunks)
        .map(|(&s, &c)| s.div_ceil(c.max(1)))
        .collect();
    let chunk_elems: usize = meta.chunks.iter().product();

    let mut chunk_coord = vec![0usize; ndim];
    loop {
        let key: String = chunk_coord
            .iter()
            .map(|c| c.to_string())
            .collect::<Vec<_>>()
            .join(".");
        let bytes = fs::read(array_path.join(&key)).map_err(|_| {
            RegridError::ZarrError(format!("missing chunk '{}'", key))
        })?;
        if bytes.len() != chunk_elems * 4 {
            return Err(RegridError::ZarrError(format!(
                "chunk '{}' has {} bytes, expected {}",
                key,
                bytes.len(),
                chunk_elems * 4
            )));
        }
        let values: Vec<f32> = bytes
            .chunks_exact(4)
            .map(|b| f32::from_le_bytes([b[0], b[1], b[2], b[3]]))
            .collect();

        // Copy chunk elements into the full array, skipping edge padding
        let mut pos = vec![0usize; ndim];
        'copy: for value in values {
            let mut dst = 0usize;
            let mut in_bounds = true;
            for d in 0..ndim {
                let idx = chunk_coord[d] * meta.chunks[d] + pos[d];
                if idx >= meta.shape[d] {
                    in_bounds = false;
                }
                dst += idx.min(meta.shape[d] - 1) * strides[d];
            }
            if in_bounds {
                flat[dst] = value;
            }
            // Odometer over the chunk-local position
            for d in (0..ndim).rev() {
                pos[d] += 1;
                if pos[d] < meta.chunks[d] {
                    continue 'copy;
                }
                pos[d] = 0;
            }
            break;
        }

        // Odometer over chunk coordinates
        let mut done = true;
        for d in (0..ndim).rev() {
            chunk_coord[d] += 1;
            if chunk_coord[d] < grid[d] {
                done = false;
                break;
            }
            chunk_coord[d] = 0;
        }
        if done {
            break;
        }
    }

    let data = ArrayD::from_shape_vec(meta.shape, flat)?;

    let mut dims = Vec::new();
    let mut attrs = HashMap::new();
    if let Ok(content) = fs::read_to_string(array_path.join(".zattrs")) {
        if let Ok(JsonValue::Object(map)) = serde_json::from_str::<JsonValue>(&content) {
            for (k, v) in map {
                if k == "_ARRAY_DIMENSIONS" {
                    if let JsonValue::Array(list) = v {
                        dims = list
                            .into_iter()
                            .filter_map(|d| d.as_str().map(str::to_string))
                            .collect();
                    }
                } else if let JsonValue::String(s) = v {
                    attrs.insert(k, s);
                }
            }
        }
    }

    Ok((data, dims, attrs))
}
