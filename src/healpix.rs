//! Ring-scheme HEALPix geometry
//!
//! Pixelization math for the Hierarchical Equal Area isoLatitude
//! Pixelization of the sphere: pixel counts, center coordinates and
//! pixel lookup for a given direction. Only the ring ordering is
//! implemented; pixel indices are counted from the north pole.
//!
//! All public coordinates are geographic degrees (latitude in
//! [-90, 90], longitude wrapped to [0, 360)); the internal math works
//! in colatitude/longitude radians.

use crate::errors::{RegridError, Result};

const HALF_PI: f64 = std::f64::consts::FRAC_PI_2;
const TWO_PI: f64 = 2.0 * std::f64::consts::PI;

/// Validate the HEALPix refinement parameter.
///
/// `nside` must be a positive power of two; the refinement level is
/// `log2(nside)` and the sphere is split into `12 * nside^2` pixels.
pub fn validate_nside(nside: usize) -> Result<()> {
    if nside == 0 || !nside.is_power_of_two() {
        return Err(RegridError::InvalidParameter {
            message: format!("nside must be a positive power of two, got {}", nside),
        });
    }
    Ok(())
}

/// Refinement level for a (validated) nside: `level = log2(nside)`.
pub fn grid_level(nside: usize) -> u32 {
    nside.trailing_zeros()
}

/// Total number of pixels at the given nside: `12 * nside^2`.
pub fn npix(nside: usize) -> usize {
    12 * nside * nside
}

/// Number of pixels in each polar cap: `2 * nside * (nside - 1)`.
fn ncap(nside: usize) -> usize {
    2 * nside * (nside - 1)
}

/// Characteristic angular radius of a pixel in radians.
///
/// Pixels are equal-area, so `sqrt(pixel area) / 2` is a usable
/// half-extent for corner sampling.
pub fn pixel_radius(nside: usize) -> f64 {
    (4.0 * std::f64::consts::PI / npix(nside) as f64).sqrt() / 2.0
}

fn isqrt(v: usize) -> usize {
    let mut r = (v as f64).sqrt() as usize;
    // Float sqrt can land one off near perfect squares
    while (r + 1) * (r + 1) <= v {
        r += 1;
    }
    while r * r > v {
        r -= 1;
    }
    r
}

/// Colatitude/longitude (radians) of the center of ring-scheme pixel `pix`.
fn pix2ang(nside: usize, pix: usize) -> (f64, f64) {
    let npix = npix(nside);
    let ncap = ncap(nside);
    debug_assert!(pix < npix);

    if pix < ncap {
        // North polar cap
        let iring = (1 + isqrt(1 + 2 * pix)) >> 1;
        let iphi = (pix + 1) - 2 * iring * (iring - 1);
        let z = 1.0 - (iring * iring) as f64 * 4.0 / npix as f64;
        let phi = (iphi as f64 - 0.5) * HALF_PI / iring as f64;
        (z.acos(), phi)
    } else if pix < npix - ncap {
        // Equatorial belt
        let ip = pix - ncap;
        let iring = ip / (4 * nside) + nside;
        let iphi = ip % (4 * nside) + 1;
        let fodd = if (iring + nside) & 1 == 1 { 1.0 } else { 0.5 };
        // iring runs past 2*nside in the southern half of the belt
        let z = (2.0 * nside as f64 - iring as f64) * 2.0 / (3.0 * nside as f64);
        let phi = (iphi as f64 - fodd) * std::f64::consts::PI / (2.0 * nside as f64);
        (z.acos(), phi)
    } else {
        // South polar cap
        let ip = npix - pix;
        let iring = (1 + isqrt(2 * ip - 1)) >> 1;
        let iphi = 4 * iring + 1 - (ip - 2 * iring * (iring - 1));
        let z = -1.0 + (iring * iring) as f64 * 4.0 / npix as f64;
        let phi = (iphi as f64 - 0.5) * HALF_PI / iring as f64;
        (z.acos(), phi)
    }
}

/// Ring-scheme pixel containing the direction (colatitude, longitude) in radians.
fn ang2pix(nside: usize, theta: f64, phi: f64) -> usize {
    let z = theta.cos();
    let za = z.abs();
    let tt = phi.rem_euclid(TWO_PI) / HALF_PI; // in [0, 4)

    if za <= 2.0 / 3.0 {
        // Equatorial region
        let temp1 = nside as f64 * (0.5 + tt);
        let temp2 = nside as f64 * z * 0.75;
        let jp = (temp1 - temp2) as i64; // ascending edge line
        let jm = (temp1 + temp2) as i64; // descending edge line

        let ir = nside as i64 + 1 + jp - jm; // ring counted from z = 2/3
        let kshift = 1 - (ir & 1);

        let nl4 = 4 * nside as i64;
        let mut ip = (jp + jm - nside as i64 + kshift + 1) / 2;
        ip = ip.rem_euclid(nl4);

        (ncap(nside) as i64 + (ir - 1) * nl4 + ip) as usize
    } else {
        // Polar caps
        let tp = tt.fract();
        let tmp = nside as f64 * (3.0 * (1.0 - za)).sqrt();

        let jp = (tp * tmp) as i64;
        let jm = ((1.0 - tp) * tmp) as i64;

        let ir = jp + jm + 1; // ring counted from the closest pole
        let mut ip = (tt * ir as f64) as i64;
        ip = ip.rem_euclid(4 * ir);

        if z > 0.0 {
            (2 * ir * (ir - 1) + ip) as usize
        } else {
            (npix(nside) as i64 - 2 * ir * (ir + 1) + ip) as usize
        }
    }
}

/// Geographic (latitude, longitude) in degrees of a pixel center.
pub fn pix_to_latlon(nside: usize, pix: usize) -> (f64, f64) {
    let (theta, phi) = pix2ang(nside, pix);
    (90.0 - theta.to_degrees(), phi.to_degrees().rem_euclid(360.0))
}

/// Ring-scheme pixel containing a geographic (latitude, longitude) in degrees.
pub fn latlon_to_pix(nside: usize, lat: f64, lon: f64) -> usize {
    let theta = (90.0 - lat).to_radians().clamp(0.0, std::f64::consts::PI);
    let phi = lon.to_radians();
    ang2pix(nside, theta, phi)
}

/// Four corner sample points of a pixel, in degrees.
///
/// Exact ring-scheme boundary math is not needed for coverage counting;
/// corners are sampled at the diagonal offsets of the characteristic
/// pixel half-extent around the center, with the longitude offset scaled
/// by 1/cos(lat) away from the poles.
pub fn pixel_corner_samples(nside: usize, pix: usize) -> [(f64, f64); 4] {
    let (lat, lon) = pix_to_latlon(nside, pix);
    let r = pixel_radius(nside).to_degrees();
    let coslat = lat.to_radians().cos().max(0.05);
    let dlon = r / coslat;

    let mut corners = [(0.0, 0.0); 4];
    for (k, (sy, sx)) in [(1.0, -1.0), (1.0, 1.0), (-1.0, 1.0), (-1.0, -1.0)]
        .iter()
        .enumerate()
    {
        let clat = (lat + sy * r).clamp(-90.0, 90.0);
        let clon = (lon + sx * dlon).rem_euclid(360.0);
        corners[k] = (clat, clon);
    }
    corners
}
