use crate::group::{point_from_bytes, point_to_hex, scalar_from_bytes, scalar_to_hex};
use curve25519_dalek::ristretto::RistrettoPoint;
use curve25519_dalek::scalar::Scalar;
use std::borrow::Cow;

pub use hex_buffer_serde::Hex;

// a single-purpose type for use in `#[serde(with)]`
pub enum PointHex {}

impl Hex<RistrettoPoint> for PointHex {
    type Error = String;

    fn create_bytes(point: &RistrettoPoint) -> Cow<[u8]> {
        Cow::from(point.compress().to_bytes().to_vec())
    }

    fn from_bytes(bytes: &[u8]) -> Result<RistrettoPoint, String> {
        point_from_bytes(bytes).map_err(|e| format!("{}", e))
    }
}

// a single-purpose type for use in `#[serde(with)]`
pub enum ScalarHex {}

impl Hex<Scalar> for ScalarHex {
    type Error = String;

    fn create_bytes(scalar: &Scalar) -> Cow<[u8]> {
        Cow::from(scalar.to_bytes().to_vec())
    }

    fn from_bytes(bytes: &[u8]) -> Result<Scalar, String> {
        scalar_from_bytes(bytes).map_err(|e| format!("{}", e))
    }
}

/// `#[serde(with)]` module for lists of points
pub mod point_vec_hex {
    use super::*;
    use serde::de::Error as _;
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(points: &[RistrettoPoint], s: S) -> Result<S::Ok, S::Error> {
        s.collect_seq(points.iter().map(point_to_hex))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Vec<RistrettoPoint>, D::Error> {
        let encoded: Vec<String> = Vec::deserialize(d)?;
        encoded
            .iter()
            .map(|e| crate::group::point_from_hex(e).map_err(D::Error::custom))
            .collect()
    }
}

/// `#[serde(with)]` module for lists of scalars
pub mod scalar_vec_hex {
    use super::*;
    use serde::de::Error as _;
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(scalars: &[Scalar], s: S) -> Result<S::Ok, S::Error> {
        s.collect_seq(scalars.iter().map(scalar_to_hex))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Vec<Scalar>, D::Error> {
        let encoded: Vec<String> = Vec::deserialize(d)?;
        encoded
            .iter()
            .map(|e| crate::group::scalar_from_hex(e).map_err(D::Error::custom))
            .collect()
    }
}

/// `#[serde(with)]` module for optional points
pub mod opt_point_hex {
    use super::*;
    use serde::de::Error as _;
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(
        point: &Option<RistrettoPoint>,
        s: S,
    ) -> Result<S::Ok, S::Error> {
        match point {
            Some(point) => s.serialize_some(&point_to_hex(point)),
            None => s.serialize_none(),
        }
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(
        d: D,
    ) -> Result<Option<RistrettoPoint>, D::Error> {
        let encoded: Option<String> = Option::deserialize(d)?;
        match encoded {
            Some(e) => Ok(Some(
                crate::group::point_from_hex(&e).map_err(D::Error::custom)?,
            )),
            None => Ok(None),
        }
    }
}

/// `#[serde(with)]` module for optional scalars
pub mod opt_scalar_hex {
    use super::*;
    use serde::de::Error as _;
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(scalar: &Option<Scalar>, s: S) -> Result<S::Ok, S::Error> {
        match scalar {
            Some(scalar) => s.serialize_some(&scalar_to_hex(scalar)),
            None => s.serialize_none(),
        }
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Option<Scalar>, D::Error> {
        let encoded: Option<String> = Option::deserialize(d)?;
        encoded
            .map(|e| crate::group::parse_scalar(&e).map_err(D::Error::custom))
            .transpose()
    }
}

/// `#[serde(with)]` module for maps of sender index to scalar.
///
/// Scalars are written as hex, but legacy decimal strings are accepted on read.
pub mod scalar_map_hex {
    use super::*;
    use indexmap::IndexMap;
    use serde::de::Error as _;
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(map: &IndexMap<u8, Scalar>, s: S) -> Result<S::Ok, S::Error> {
        s.collect_map(map.iter().map(|(k, v)| (k, scalar_to_hex(v))))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<IndexMap<u8, Scalar>, D::Error> {
        let encoded: IndexMap<u8, String> = IndexMap::deserialize(d)?;
        encoded
            .into_iter()
            .map(|(k, v)| {
                crate::group::parse_scalar(&v)
                    .map(|s| (k, s))
                    .map_err(D::Error::custom)
            })
            .collect()
    }
}
