//! # Polyline Codec
//!
//! Encoded polyline format used by OSRM and Google routing APIs.
//!
//! Each coordinate is stored as fixed-point integers (`value * 10^precision`),
//! delta-encoded against the previous point, zigzag-signed and written as
//! little-endian 5-bit groups offset by 63. A set `0x20` bit marks a
//! continuation group. OSRM's `polyline6` geometry uses precision 6.
//!
//! ## Example
//!
//! ```rust
//! use route_progress::{Coordinate, polyline};
//!
//! let route = vec![
//!     Coordinate::new(41.1297, 14.7697),
//!     Coordinate::new(41.1305, 14.7710),
//! ];
//!
//! let encoded = polyline::encode_polyline6(&route);
//! let decoded = polyline::decode_polyline6(&encoded);
//! assert_eq!(decoded.len(), 2);
//! assert!((decoded[1].latitude - 41.1305).abs() < 1e-6);
//! ```

use crate::Coordinate;

/// Precision used by OSRM `geometries=polyline6`.
pub const POLYLINE6_PRECISION: u32 = 6;

const CHUNK_OFFSET: u8 = 63;
const CHUNK_MASK: u64 = 0x1F;
const CONTINUATION_BIT: u64 = 0x20;

/// Decode a precision-6 polyline. See [`decode_polyline`].
pub fn decode_polyline6(encoded: &str) -> Vec<Coordinate> {
    decode_polyline(encoded, POLYLINE6_PRECISION)
}

/// Decode an encoded polyline into coordinates.
///
/// Returns an empty vector for empty or malformed input: characters outside
/// the encoding alphabet, a value cut off mid-group, a latitude without its
/// longitude, or a value wider than 64 bits.
pub fn decode_polyline(encoded: &str, precision: u32) -> Vec<Coordinate> {
    let bytes = encoded.as_bytes();
    let factor = 10f64.powi(precision as i32);

    let mut coordinates = Vec::new();
    let mut index = 0;
    let mut lat: i64 = 0;
    let mut lng: i64 = 0;

    while index < bytes.len() {
        let Some(delta_lat) = next_value(bytes, &mut index) else {
            return Vec::new();
        };
        let Some(delta_lng) = next_value(bytes, &mut index) else {
            return Vec::new();
        };

        lat = lat.wrapping_add(delta_lat);
        lng = lng.wrapping_add(delta_lng);

        coordinates.push(Coordinate::new(lat as f64 / factor, lng as f64 / factor));
    }

    coordinates
}

/// Read one zigzag varint starting at `index`, advancing past it.
fn next_value(bytes: &[u8], index: &mut usize) -> Option<i64> {
    let mut result: u64 = 0;
    let mut shift = 0u32;

    loop {
        let byte = *bytes.get(*index)?;
        *index += 1;

        if !(CHUNK_OFFSET..=CHUNK_OFFSET + 0x3F).contains(&byte) {
            return None;
        }
        if shift >= 64 {
            return None;
        }

        let chunk = (byte - CHUNK_OFFSET) as u64;
        result |= (chunk & CHUNK_MASK) << shift;
        shift += 5;

        if chunk & CONTINUATION_BIT == 0 {
            break;
        }
    }

    let magnitude = (result >> 1) as i64;
    Some(if result & 1 != 0 { !magnitude } else { magnitude })
}

/// Encode coordinates as a precision-6 polyline. See [`encode_polyline`].
pub fn encode_polyline6(coordinates: &[Coordinate]) -> String {
    encode_polyline(coordinates, POLYLINE6_PRECISION)
}

/// Encode coordinates as a polyline string.
///
/// Values are rounded to the nearest `10^-precision` degree, so decoding the
/// result reproduces the input within that tolerance. Non-finite or
/// out-of-range coordinates are skipped.
pub fn encode_polyline(coordinates: &[Coordinate], precision: u32) -> String {
    let factor = 10f64.powi(precision as i32);
    let mut encoded = String::with_capacity(coordinates.len() * 8);

    let mut prev_lat: i64 = 0;
    let mut prev_lng: i64 = 0;

    for c in coordinates.iter().filter(|c| c.is_valid()) {
        let lat = (c.latitude * factor).round() as i64;
        let lng = (c.longitude * factor).round() as i64;

        // Wraps like the decoder's running sum
        push_value(&mut encoded, lat.wrapping_sub(prev_lat));
        push_value(&mut encoded, lng.wrapping_sub(prev_lng));

        prev_lat = lat;
        prev_lng = lng;
    }

    encoded
}

fn push_value(out: &mut String, value: i64) {
    let mut zigzag = ((value << 1) ^ (value >> 63)) as u64;

    while zigzag >= CONTINUATION_BIT {
        let chunk = (CONTINUATION_BIT | (zigzag & CHUNK_MASK)) as u8;
        out.push((chunk + CHUNK_OFFSET) as char);
        zigzag >>= 5;
    }
    out.push((zigzag as u8 + CHUNK_OFFSET) as char);
}
