//! Ristretto255 group arithmetic.
//!
//! All group elements enter the crate through canonical Ristretto decompression, which only
//! ever yields members of the prime-order group. All scalars enter through canonical decoding,
//! so they are always reduced modulo the group order.

use crate::*;
use curve25519_dalek::constants::{RISTRETTO_BASEPOINT_POINT, RISTRETTO_BASEPOINT_TABLE};
use curve25519_dalek::ristretto::{CompressedRistretto, RistrettoPoint};
use curve25519_dalek::scalar::Scalar;
use curve25519_dalek::traits::Identity;
use rand::{CryptoRng, RngCore};

/// Byte width of an encoded group element
pub const ELEMENT_LENGTH: usize = 32;

/// 32 bytes, minus one for storing the length, minus one more for the minimum random entropy
/// needed to find a valid point.
pub const MAX_EMBED_LENGTH: usize = ELEMENT_LENGTH - 2;

/// Default number of attempts made by `embed` before giving up.
pub const DEFAULT_EMBED_ATTEMPTS: usize = 1000;

/// The group generator
pub fn generator() -> RistrettoPoint {
    RISTRETTO_BASEPOINT_POINT
}

/// Multiply the generator by a scalar
pub fn base_mul(scalar: &Scalar) -> RistrettoPoint {
    &RISTRETTO_BASEPOINT_TABLE * scalar
}

/// A uniformly random scalar in [0, order)
pub fn random_scalar<R: RngCore + CryptoRng>(rng: &mut R) -> Scalar {
    Scalar::random(rng)
}

/// Embed binary data into a valid Ristretto255 point
pub fn embed<R: RngCore + CryptoRng>(rng: &mut R, data: &[u8]) -> Result<RistrettoPoint, Error> {
    embed_with_attempts(rng, data, DEFAULT_EMBED_ATTEMPTS)
}

/// Embed binary data into a valid Ristretto255 point, giving up after `max_attempts`.
pub fn embed_with_attempts<R: RngCore + CryptoRng>(
    rng: &mut R,
    data: &[u8],
    max_attempts: usize,
) -> Result<RistrettoPoint, Error> {
    let length = data.len();
    if length > MAX_EMBED_LENGTH {
        return Err(Error::PayloadTooLarge(length, MAX_EMBED_LENGTH));
    }

    for _ in 0..max_attempts {
        let mut bytes = [0u8; ELEMENT_LENGTH];
        rng.fill_bytes(&mut bytes);

        // Ristretto needs the lowest bit of the first byte to be off,
        // so the length is stored shifted left by one bit.
        bytes[0] = (length as u8) << 1;
        bytes[1..=length].copy_from_slice(data);

        if let Some(point) = CompressedRistretto(bytes).decompress() {
            return Ok(point);
        }
    }

    Err(Error::EncodingExhausted(max_attempts))
}

/// Extract embedded data from a Ristretto255 point
pub fn extract(point: &RistrettoPoint) -> Result<Vec<u8>, Error> {
    let bytes = point.compress().to_bytes();
    let length = (bytes[0] >> 1) as usize;
    if length > MAX_EMBED_LENGTH {
        return Err(Error::malformed(format!(
            "embedded length {} exceeds {}",
            length, MAX_EMBED_LENGTH
        )));
    }

    Ok(bytes[1..=length].to_vec())
}

/// Embed string data into a Ristretto255 point
pub fn embed_str<R: RngCore + CryptoRng>(
    rng: &mut R,
    message: &str,
) -> Result<RistrettoPoint, Error> {
    embed(rng, message.as_bytes())
}

/// Extract string data from a Ristretto255 point
pub fn extract_str(point: &RistrettoPoint) -> Result<String, Error> {
    String::from_utf8(extract(point)?)
        .map_err(|_| Error::malformed("embedded payload is not valid UTF-8"))
}

/// The scalar for a 1-based trustee index
pub fn index_scalar(index: u8) -> Scalar {
    Scalar::from(index as u64)
}

/// Sum up a list of points
pub fn sum_points<'a, I: IntoIterator<Item = &'a RistrettoPoint>>(points: I) -> RistrettoPoint {
    points
        .into_iter()
        .fold(RistrettoPoint::identity(), |memo, term| memo + term)
}

/// Sum up a list of scalars modulo the group order
pub fn sum_scalars<'a, I: IntoIterator<Item = &'a Scalar>>(scalars: I) -> Scalar {
    scalars
        .into_iter()
        .fold(Scalar::zero(), |memo, term| memo + term)
}

/// Decode a canonically encoded group element
pub fn point_from_bytes(bytes: &[u8]) -> Result<RistrettoPoint, Error> {
    if bytes.len() != ELEMENT_LENGTH {
        return Err(Error::malformed(format!(
            "group element must be {} bytes, found {}",
            ELEMENT_LENGTH,
            bytes.len()
        )));
    }
    let mut buf = [0u8; ELEMENT_LENGTH];
    buf.copy_from_slice(bytes);

    CompressedRistretto(buf)
        .decompress()
        .ok_or_else(|| Error::malformed("not a canonical ristretto255 element"))
}

/// Decode a hex encoded group element
pub fn point_from_hex(hex_str: &str) -> Result<RistrettoPoint, Error> {
    point_from_bytes(&hex::decode(hex_str)?)
}

/// Hex encode a group element
pub fn point_to_hex(point: &RistrettoPoint) -> String {
    hex::encode(point.compress().as_bytes())
}

/// Decode a canonically encoded (little-endian, fully reduced) scalar
pub fn scalar_from_bytes(bytes: &[u8]) -> Result<Scalar, Error> {
    if bytes.len() != 32 {
        return Err(Error::malformed(format!(
            "scalar must be 32 bytes, found {}",
            bytes.len()
        )));
    }
    let mut buf = [0u8; 32];
    buf.copy_from_slice(bytes);

    Scalar::from_canonical_bytes(buf)
        .ok_or_else(|| Error::malformed("scalar is not reduced modulo the group order"))
}

/// Decode a hex encoded scalar
pub fn scalar_from_hex(hex_str: &str) -> Result<Scalar, Error> {
    scalar_from_bytes(&hex::decode(hex_str)?)
}

/// Hex encode a scalar
pub fn scalar_to_hex(scalar: &Scalar) -> String {
    hex::encode(scalar.as_bytes())
}

/// Parse a base-10 integer string into a scalar.
///
/// Values must already be reduced modulo the group order; anything else is rejected rather
/// than silently reduced.
pub fn scalar_from_decimal(decimal: &str) -> Result<Scalar, Error> {
    if decimal.is_empty() {
        return Err(Error::malformed("empty decimal scalar"));
    }

    // Little-endian 64-bit limbs
    let mut limbs = [0u64; 4];
    for c in decimal.chars() {
        let digit = c
            .to_digit(10)
            .ok_or_else(|| Error::malformed(format!("invalid decimal digit '{}'", c)))?;

        let mut carry = digit as u128;
        for limb in limbs.iter_mut() {
            let product = (*limb as u128) * 10 + carry;
            *limb = product as u64;
            carry = product >> 64;
        }
        if carry != 0 {
            return Err(Error::malformed("decimal scalar exceeds 256 bits"));
        }
    }

    let mut bytes = [0u8; 32];
    for (i, limb) in limbs.iter().enumerate() {
        bytes[i * 8..(i + 1) * 8].copy_from_slice(&limb.to_le_bytes());
    }
    scalar_from_bytes(&bytes)
}

/// Parse a scalar that may be either hex (64 characters) or decimal
pub fn parse_scalar(value: &str) -> Result<Scalar, Error> {
    if value.len() == 64 && value.chars().all(|c| c.is_ascii_hexdigit()) {
        scalar_from_hex(value)
    } else {
        scalar_from_decimal(value)
    }
}
