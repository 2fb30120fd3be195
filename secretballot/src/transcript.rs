//! Fiat-Shamir transcripts for the non-interactive proofs.

use curve25519_dalek::ristretto::RistrettoPoint;
use curve25519_dalek::scalar::Scalar;
use digest::Digest;
use sha2::Sha512;

/// Accumulates public proof inputs and turns them into challenge scalars.
///
/// Every item is length-prefixed so distinct inputs can never produce the same hash input.
#[derive(Clone)]
pub(crate) struct Transcript {
    hasher: Sha512,
}

impl Transcript {
    pub fn new(domain: &'static [u8]) -> Self {
        let mut transcript = Transcript {
            hasher: Sha512::new(),
        };
        transcript.append_bytes(domain);
        transcript
    }

    pub fn append_bytes(&mut self, bytes: &[u8]) {
        self.hasher.update(&(bytes.len() as u64).to_le_bytes());
        self.hasher.update(bytes);
    }

    pub fn append_u64(&mut self, value: u64) {
        self.hasher.update(&value.to_le_bytes());
    }

    pub fn append_point(&mut self, point: &RistrettoPoint) {
        self.hasher.update(point.compress().as_bytes());
    }

    pub fn append_points<'a, I: IntoIterator<Item = &'a RistrettoPoint>>(&mut self, points: I) {
        let points: Vec<&RistrettoPoint> = points.into_iter().collect();
        self.append_u64(points.len() as u64);
        for point in points {
            self.append_point(point);
        }
    }

    /// Derive a challenge without consuming the transcript
    pub fn challenge(&self) -> Scalar {
        Scalar::from_hash(self.hasher.clone())
    }

    /// Derive the `i`th challenge of a family sharing this transcript as prefix
    pub fn indexed_challenge(&self, i: u64) -> Scalar {
        let mut hasher = self.hasher.clone();
        hasher.update(b"index");
        hasher.update(&i.to_le_bytes());
        Scalar::from_hash(hasher)
    }
}

/// Hash arbitrary bytes onto the group, for nothing-up-my-sleeve generators
pub(crate) fn hash_to_point(bytes: &[u8]) -> RistrettoPoint {
    RistrettoPoint::hash_from_bytes::<Sha512>(bytes)
}
