//! MuscleMap Geo Module
//!
//! Geohash encoding/decoding, Haversine distance, and radius queries.
//! Compiled to WebAssembly for universal runtime support (Node, Bun, Browser).

use musclemap_core::{KernelError, KernelResult};
use serde::{Deserialize, Serialize};
use wasm_bindgen::prelude::*;

const EARTH_RADIUS_METERS: f64 = 6_371_000.0;
const DEG_TO_RAD: f64 = std::f64::consts::PI / 180.0;
const RAD_TO_DEG: f64 = 180.0 / std::f64::consts::PI;
const POLE_LAT_THRESHOLD: f64 = 89.9;

/// Base32 alphabet for geohash encoding
const BASE32: &[u8; 32] = b"0123456789bcdefghjkmnpqrstuvwxyz";

/// Decode table for base32 characters (128 entries for ASCII)
const DECODE_TABLE: [i8; 128] = {
    let mut table = [-1i8; 128];
    table[b'0' as usize] = 0;
    table[b'1' as usize] = 1;
    table[b'2' as usize] = 2;
    table[b'3' as usize] = 3;
    table[b'4' as usize] = 4;
    table[b'5' as usize] = 5;
    table[b'6' as usize] = 6;
    table[b'7' as usize] = 7;
    table[b'8' as usize] = 8;
    table[b'9' as usize] = 9;
    table[b'b' as usize] = 10;
    table[b'B' as usize] = 10;
    table[b'c' as usize] = 11;
    table[b'C' as usize] = 11;
    table[b'd' as usize] = 12;
    table[b'D' as usize] = 12;
    table[b'e' as usize] = 13;
    table[b'E' as usize] = 13;
    table[b'f' as usize] = 14;
    table[b'F' as usize] = 14;
    table[b'g' as usize] = 15;
    table[b'G' as usize] = 15;
    table[b'h' as usize] = 16;
    table[b'H' as usize] = 16;
    table[b'j' as usize] = 17;
    table[b'J' as usize] = 17;
    table[b'k' as usize] = 18;
    table[b'K' as usize] = 18;
    table[b'm' as usize] = 19;
    table[b'M' as usize] = 19;
    table[b'n' as usize] = 20;
    table[b'N' as usize] = 20;
    table[b'p' as usize] = 21;
    table[b'P' as usize] = 21;
    table[b'q' as usize] = 22;
    table[b'Q' as usize] = 22;
    table[b'r' as usize] = 23;
    table[b'R' as usize] = 23;
    table[b's' as usize] = 24;
    table[b'S' as usize] = 24;
    table[b't' as usize] = 25;
    table[b'T' as usize] = 25;
    table[b'u' as usize] = 26;
    table[b'U' as usize] = 26;
    table[b'v' as usize] = 27;
    table[b'V' as usize] = 27;
    table[b'w' as usize] = 28;
    table[b'W' as usize] = 28;
    table[b'x' as usize] = 29;
    table[b'X' as usize] = 29;
    table[b'y' as usize] = 30;
    table[b'Y' as usize] = 30;
    table[b'z' as usize] = 31;
    table[b'Z' as usize] = 31;
    table
};

/// Approximate cell widths in meters for each precision level, used only
/// by `optimal_precision` (a convenience query with no decode-accuracy
/// contract of its own).
const CELL_WIDTHS: [f64; 12] = [
    5_009_400.0,
    1_252_350.0,
    156_543.0,
    39_135.8,
    4_891.97,
    1_222.99,
    152.87,
    38.22,
    4.78,
    1.19,
    0.149,
    0.037,
];

/// Cell half-extents in degrees `(lat, lng)` for geohash precision `n`:
/// `(90 / 2^ceil(5n/2), 180 / 2^floor(5n/2))`.
fn half_extents(precision: usize) -> (f64, f64) {
    let n = precision as u32;
    let lat_exp = (5 * n).div_ceil(2);
    let lng_exp = (5 * n) / 2;
    (90.0 / 2f64.powi(lat_exp as i32), 180.0 / 2f64.powi(lng_exp as i32))
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[wasm_bindgen(getter_with_clone)]
pub struct DecodedCoords {
    pub lat: f64,
    pub lng: f64,
}

#[wasm_bindgen]
impl DecodedCoords {
    #[wasm_bindgen(constructor)]
    pub fn new(lat: f64, lng: f64) -> DecodedCoords {
        DecodedCoords { lat, lng }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[wasm_bindgen(getter_with_clone)]
pub struct BoundingBox {
    pub min_lat: f64,
    pub max_lat: f64,
    pub min_lng: f64,
    pub max_lng: f64,
}

#[wasm_bindgen]
impl BoundingBox {
    #[wasm_bindgen(constructor)]
    pub fn new(min_lat: f64, max_lat: f64, min_lng: f64, max_lng: f64) -> BoundingBox {
        BoundingBox { min_lat, max_lat, min_lng, max_lng }
    }

    pub fn contains(&self, lat: f64, lng: f64) -> bool {
        lat >= self.min_lat && lat <= self.max_lat && lng >= self.min_lng && lng <= self.max_lng
    }
}

/// A point within radius of a query center, as returned by
/// [`filter_within_radius`].
#[derive(Debug, Clone, Serialize, Deserialize)]
#[wasm_bindgen(getter_with_clone)]
pub struct RadiusMatch {
    pub id: String,
    pub lat: f64,
    pub lng: f64,
    pub distance_meters: f64,
}

fn validate_coords(lat: f64, lng: f64) -> KernelResult<()> {
    if !(-90.0..=90.0).contains(&lat) {
        return Err(KernelError::invalid_input("lat must be in [-90, 90]"));
    }
    if !(-180.0..=180.0).contains(&lng) {
        return Err(KernelError::invalid_input("lng must be in [-180, 180]"));
    }
    Ok(())
}

fn geohash_encode_inner(lat: f64, lng: f64, precision: u8) -> KernelResult<String> {
    validate_coords(lat, lng)?;
    if !(1..=12).contains(&precision) {
        return Err(KernelError::invalid_input("precision must be in [1, 12]"));
    }
    let precision = precision as usize;

    let mut lat_range = (-90.0, 90.0);
    let mut lng_range = (-180.0, 180.0);
    let mut is_lng = true;
    let mut bit = 0u8;
    let mut ch = 0u8;
    let mut result = String::with_capacity(precision);

    while result.len() < precision {
        let (range, val) = if is_lng { (&mut lng_range, lng) } else { (&mut lat_range, lat) };

        let mid = (range.0 + range.1) / 2.0;

        if val >= mid {
            ch |= 1 << (4 - bit);
            range.0 = mid;
        } else {
            range.1 = mid;
        }

        is_lng = !is_lng;
        bit += 1;

        if bit == 5 {
            result.push(BASE32[ch as usize] as char);
            bit = 0;
            ch = 0;
        }
    }

    Ok(result)
}

/// Encode latitude/longitude to a geohash string, `precision` characters.
#[wasm_bindgen]
pub fn geohash_encode(lat: f64, lng: f64, precision: u8) -> Result<String, JsValue> {
    geohash_encode_inner(lat, lng, precision).map_err(Into::into)
}

fn geohash_decode_inner(hash: &str) -> KernelResult<DecodedCoords> {
    if hash.is_empty() || hash.len() > 12 {
        return Err(KernelError::invalid_input("geohash must be 1-12 characters"));
    }

    let mut lat_range = (-90.0, 90.0);
    let mut lng_range = (-180.0, 180.0);
    let mut is_lng = true;

    for c in hash.bytes() {
        if c >= 128 {
            return Err(KernelError::decode_error("invalid geohash character"));
        }

        let val = DECODE_TABLE[c as usize];
        if val < 0 {
            return Err(KernelError::decode_error(format!(
                "invalid geohash character: {}",
                c as char
            )));
        }

        for bit in (0..5).rev() {
            let mid = if is_lng {
                (lng_range.0 + lng_range.1) / 2.0
            } else {
                (lat_range.0 + lat_range.1) / 2.0
            };

            if is_lng {
                if val & (1 << bit) != 0 {
                    lng_range.0 = mid;
                } else {
                    lng_range.1 = mid;
                }
            } else if val & (1 << bit) != 0 {
                lat_range.0 = mid;
            } else {
                lat_range.1 = mid;
            }

            is_lng = !is_lng;
        }
    }

    Ok(DecodedCoords {
        lat: (lat_range.0 + lat_range.1) / 2.0,
        lng: (lng_range.0 + lng_range.1) / 2.0,
    })
}

/// Decode a geohash string to the center of its cell.
#[wasm_bindgen]
pub fn geohash_decode(hash: &str) -> Result<DecodedCoords, JsValue> {
    geohash_decode_inner(hash).map_err(Into::into)
}

/// Distance between two points on the Earth's surface, in meters.
#[wasm_bindgen]
pub fn haversine_meters(lat1: f64, lng1: f64, lat2: f64, lng2: f64) -> f64 {
    let phi1 = lat1 * DEG_TO_RAD;
    let phi2 = lat2 * DEG_TO_RAD;
    let d_phi = (lat2 - lat1) * DEG_TO_RAD;
    let d_lambda = (lng2 - lng1) * DEG_TO_RAD;

    let sin_d_phi = (d_phi / 2.0).sin();
    let sin_d_lambda = (d_lambda / 2.0).sin();

    let a = sin_d_phi * sin_d_phi + phi1.cos() * phi2.cos() * sin_d_lambda * sin_d_lambda;

    EARTH_RADIUS_METERS * 2.0 * a.sqrt().atan2((1.0 - a).sqrt())
}

#[wasm_bindgen]
pub fn is_within_radius(lat1: f64, lng1: f64, lat2: f64, lng2: f64, radius_meters: f64) -> bool {
    haversine_meters(lat1, lng1, lat2, lng2) <= radius_meters
}

/// Bounding box for a point and radius. Returns the full longitude span
/// `[-180, 180]` when `|lat| > 89.9°`, where the longitude delta formula
/// blows up near the poles.
#[wasm_bindgen]
pub fn bounding_box(lat: f64, lng: f64, radius_meters: f64) -> BoundingBox {
    let lat_delta = (radius_meters / EARTH_RADIUS_METERS) * RAD_TO_DEG;

    let (min_lng, max_lng) = if lat.abs() > POLE_LAT_THRESHOLD {
        (-180.0, 180.0)
    } else {
        let lng_delta = (radius_meters / (EARTH_RADIUS_METERS * (lat * DEG_TO_RAD).cos())) * RAD_TO_DEG;
        (lng - lng_delta, lng + lng_delta)
    };

    BoundingBox {
        min_lat: (lat - lat_delta).max(-90.0),
        max_lat: (lat + lat_delta).min(90.0),
        min_lng,
        max_lng,
    }
}

/// Recommended geohash precision for a search radius, based on approximate
/// cell width at each precision level.
#[wasm_bindgen]
pub fn optimal_precision(radius_meters: f64) -> u8 {
    for (i, &width) in CELL_WIDTHS.iter().enumerate() {
        if radius_meters >= width {
            return (i + 1) as u8;
        }
    }
    12
}

/// The 8 surrounding cells at the same precision `[N, NE, E, SE, S, SW, W,
/// NW]`. Wraps at the anti-meridian; a pole-crossing offset returns the
/// center cell's own hash (cells clamp to the poles rather than jump to an
/// adjacent longitude band).
#[wasm_bindgen]
pub fn geohash_neighbors(hash: &str) -> Result<Vec<String>, JsValue> {
    let precision = hash.len();
    if !(1..=12).contains(&precision) {
        return Err(KernelError::invalid_input("geohash must be 1-12 characters").into());
    }

    let decoded = geohash_decode_inner(hash)?;
    let (lat_half, lng_half) = half_extents(precision);

    let offsets: [(i8, i8); 8] = [
        (1, 0),
        (1, 1),
        (0, 1),
        (-1, 1),
        (-1, 0),
        (-1, -1),
        (0, -1),
        (1, -1),
    ];

    let mut neighbors = Vec::with_capacity(8);

    for (d_lat, d_lng) in offsets {
        let n_lat = decoded.lat + (d_lat as f64) * lat_half * 2.0;

        if n_lat > 90.0 || n_lat < -90.0 {
            neighbors.push(hash.to_string());
            continue;
        }

        let mut n_lng = decoded.lng + (d_lng as f64) * lng_half * 2.0;
        while n_lng > 180.0 {
            n_lng -= 360.0;
        }
        while n_lng < -180.0 {
            n_lng += 360.0;
        }

        neighbors.push(geohash_encode_inner(n_lat, n_lng, precision as u8)?);
    }

    Ok(neighbors)
}

/// Encode parallel `lats`/`lngs` arrays to geohashes at one precision, in
/// input order. Fails with `InvalidShape` if the arrays differ in length.
#[wasm_bindgen]
pub fn geohash_encode_batch(lats: &[f64], lngs: &[f64], precision: u8) -> Result<Vec<String>, JsValue> {
    if lats.len() != lngs.len() {
        return Err(KernelError::invalid_shape("lats and lngs must have the same length").into());
    }

    lats.iter()
        .zip(lngs)
        .map(|(&lat, &lng)| geohash_encode_inner(lat, lng, precision).map_err(Into::into))
        .collect()
}

/// Distance from one origin to each of `targets` (flat `[lat, lng, ...]`).
#[wasm_bindgen]
pub fn haversine_batch(origin_lat: f64, origin_lng: f64, targets: &[f64]) -> Result<Vec<f64>, JsValue> {
    if targets.len() % 2 != 0 {
        return Err(KernelError::invalid_shape("targets array must have even length").into());
    }

    Ok(targets
        .chunks(2)
        .map(|chunk| haversine_meters(origin_lat, origin_lng, chunk[0], chunk[1]))
        .collect())
}

/// Indices of points within radius of the origin (flat `[lat, lng, ...]`
/// targets). Kept as a lighter-weight alternative to
/// [`filter_within_radius`] for callers that only need positions.
#[wasm_bindgen]
pub fn radius_indices(
    origin_lat: f64,
    origin_lng: f64,
    targets: &[f64],
    radius_meters: f64,
) -> Result<Vec<u32>, JsValue> {
    if targets.len() % 2 != 0 {
        return Err(KernelError::invalid_shape("targets array must have even length").into());
    }

    Ok(targets
        .chunks(2)
        .enumerate()
        .filter(|(_, chunk)| is_within_radius(origin_lat, origin_lng, chunk[0], chunk[1], radius_meters))
        .map(|(i, _)| i as u32)
        .collect())
}

/// Points within radius of `(center_lat, center_lng)`, carrying their
/// caller-supplied id. Fails with `InvalidShape` if `lats`, `lngs` and
/// `ids` differ in length. Preserves input order.
#[wasm_bindgen]
pub fn filter_within_radius(
    center_lat: f64,
    center_lng: f64,
    lats: &[f64],
    lngs: &[f64],
    ids: Vec<String>,
    radius_meters: f64,
) -> Result<Vec<RadiusMatch>, JsValue> {
    if lats.len() != lngs.len() || lats.len() != ids.len() {
        return Err(KernelError::invalid_shape("lats, lngs and ids must have the same length").into());
    }

    let mut matches = Vec::new();
    for ((lat, lng), id) in lats.iter().zip(lngs).zip(ids) {
        let distance = haversine_meters(center_lat, center_lng, *lat, *lng);
        if distance <= radius_meters {
            matches.push(RadiusMatch {
                id,
                lat: *lat,
                lng: *lng,
                distance_meters: distance,
            });
        }
    }

    Ok(matches)
}
