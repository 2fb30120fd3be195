//! Feldman verifiable secret sharing, used as an additive distributed key generation.
//!
//! Every trustee holds a private polynomial `f_k` and publishes Feldman commitments
//! `C_{k,j} = a_{k,j}·G` to its coefficients. Trustee `i` receives `f_k(i)` from every other
//! trustee `k`, checks it against `C_k`, and sums everything it received (plus `f_i(i)`) into
//! its keyshare. The election public key is the sum of all constant-term commitments.

use crate::*;
use curve25519_dalek::ristretto::RistrettoPoint;
use curve25519_dalek::scalar::Scalar;
use curve25519_dalek::traits::Identity;
use indexmap::IndexMap;
use rand::{CryptoRng, RngCore};
use std::convert::TryFrom;
use zeroize::Zeroize;

/// A trustee's secret polynomial. Coefficient `j` multiplies `x^j`.
///
/// Never serialized. Zeroed when dropped.
pub struct PrivatePolynomial {
    coefficients: Vec<Scalar>,
}

impl PrivatePolynomial {
    /// Sample a random polynomial with `threshold` coefficients (degree `threshold - 1`)
    pub fn random<R: RngCore + CryptoRng>(rng: &mut R, threshold: u8) -> Self {
        let coefficients = (0..threshold.max(1)).map(|_| random_scalar(rng)).collect();
        PrivatePolynomial { coefficients }
    }

    /// Evaluate the polynomial at `x` (Horner's method)
    pub fn evaluate(&self, x: &Scalar) -> Scalar {
        self.coefficients
            .iter()
            .rev()
            .fold(Scalar::zero(), |acc, coefficient| acc * x + coefficient)
    }

    /// Evaluate at a 1-based trustee index
    pub fn share_for(&self, index: u8) -> Scalar {
        self.evaluate(&index_scalar(index))
    }

    /// Feldman commitment to every coefficient
    pub fn commitment(&self) -> Commitment {
        Commitment(self.coefficients.iter().map(base_mul).collect())
    }

    pub fn degree(&self) -> usize {
        self.coefficients.len() - 1
    }
}

impl Drop for PrivatePolynomial {
    fn drop(&mut self) {
        self.coefficients.zeroize();
    }
}

/// Feldman commitments `a_j·G` to a trustee's polynomial coefficients.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
#[serde(transparent)]
pub struct Commitment(#[serde(with = "point_vec_hex")] pub Vec<RistrettoPoint>);

impl Commitment {
    /// The commitment to the constant term, which is this trustee's contribution to the
    /// election public key.
    pub fn constant_term(&self) -> RistrettoPoint {
        self.0.first().cloned().unwrap_or_else(RistrettoPoint::identity)
    }

    /// `Σ_j C_j · x^j`, which equals `f(x)·G` for an honest commitment
    pub fn evaluate(&self, x: &Scalar) -> RistrettoPoint {
        self.0
            .iter()
            .rev()
            .fold(RistrettoPoint::identity(), |acc, c| acc * x + c)
    }

    pub fn evaluate_at(&self, index: u8) -> RistrettoPoint {
        self.evaluate(&index_scalar(index))
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// Check a decrypted pairwise share against the sender's commitment
pub fn verify_share(share: &Scalar, recipient_index: u8, commitment: &Commitment) -> bool {
    base_mul(share) == commitment.evaluate_at(recipient_index)
}

/// Outcome of checking one received pairwise share.
///
/// Stored as `true` / `false` / `null` so documents stay readable by older tooling.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(from = "Option<bool>", into = "Option<bool>")]
pub enum ShareVerification {
    Passed,
    Failed,
    Pending,
}

impl ShareVerification {
    pub fn from_check(passed: bool) -> Self {
        if passed {
            ShareVerification::Passed
        } else {
            ShareVerification::Failed
        }
    }
}

impl Default for ShareVerification {
    fn default() -> Self {
        ShareVerification::Pending
    }
}

impl From<Option<bool>> for ShareVerification {
    fn from(value: Option<bool>) -> Self {
        match value {
            Some(true) => ShareVerification::Passed,
            Some(false) => ShareVerification::Failed,
            None => ShareVerification::Pending,
        }
    }
}

impl From<ShareVerification> for Option<bool> {
    fn from(value: ShareVerification) -> Self {
        match value {
            ShareVerification::Passed => Some(true),
            ShareVerification::Failed => Some(false),
            ShareVerification::Pending => None,
        }
    }
}

/// Sum the self-share with every received share.
///
/// Addition is commutative, so the order shares arrived in has no effect on the result.
pub fn compute_keyshare(self_share: &Scalar, received: &IndexMap<u8, Scalar>) -> Scalar {
    self_share + sum_scalars(received.values())
}

/// The election public key: the sum of every trustee's constant-term commitment
pub fn threshold_public_key<'a, I>(commitments: I) -> RistrettoPoint
where
    I: IntoIterator<Item = &'a Commitment>,
{
    commitments
        .into_iter()
        .fold(RistrettoPoint::identity(), |acc, c| acc + c.constant_term())
}

/// The public image `keyshare·G` of the keyshare held by the trustee at `index`, computed
/// from public commitments alone.
pub fn public_keyshare<'a, I>(index: u8, commitments: I) -> RistrettoPoint
where
    I: IntoIterator<Item = &'a Commitment>,
{
    let x = index_scalar(index);
    commitments
        .into_iter()
        .fold(RistrettoPoint::identity(), |acc, c| acc + c.evaluate(&x))
}

/// A pairwise share, ECIES-encrypted to its recipient's encryption key
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
#[serde(transparent)]
pub struct EncryptedShare(#[serde(with = "hex_serde")] pub Vec<u8>);

impl EncryptedShare {
    pub fn seal<R: RngCore + CryptoRng>(
        rng: &mut R,
        recipient: &RistrettoPoint,
        share: &Scalar,
    ) -> Result<Self, Error> {
        Ok(EncryptedShare(ecies::encrypt(rng, recipient, share.as_bytes())?))
    }

    /// Decrypt with the recipient's encryption secret. `sender` is used for error reporting.
    pub fn open(&self, secret: &Scalar, sender: u8) -> Result<Scalar, Error> {
        let mut bytes =
            ecies::decrypt(secret, &self.0).map_err(|_| Error::ShareDecryptionFailed(sender))?;
        let share = <[u8; 32]>::try_from(bytes.as_slice())
            .ok()
            .and_then(Scalar::from_canonical_bytes)
            .ok_or(Error::ShareDecryptionFailed(sender));
        bytes.zeroize();
        share
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand_chacha::ChaCha20Rng;

    #[test]
    fn test_feldman() {
        let mut rng = ChaCha20Rng::from_seed([20u8; 32]);
        let poly = PrivatePolynomial::random(&mut rng, 3);
        let commitment = poly.commitment();
        assert_eq!(poly.degree(), 2);
        assert_eq!(commitment.len(), 3);

        for index in 1..=5 {
            let share = poly.share_for(index);
            assert!(verify_share(&share, index, &commitment));

            // Tampered share or wrong index fails
            assert!(!verify_share(&(share + Scalar::one()), index, &commitment));
            assert!(!verify_share(&share, index + 1, &commitment));
        }

        // f(0) is the constant term
        assert_eq!(base_mul(&poly.evaluate(&Scalar::zero())), commitment.constant_term());
    }

    #[test]
    fn test_keyshares_match_public_key() {
        let mut rng = ChaCha20Rng::from_seed([21u8; 32]);
        let n = 3u8;
        let polys: Vec<_> = (0..n).map(|_| PrivatePolynomial::random(&mut rng, n)).collect();
        let commitments: Vec<_> = polys.iter().map(|p| p.commitment()).collect();

        let mut keyshares = Vec::new();
        for i in 1..=n {
            let self_share = polys[(i - 1) as usize].share_for(i);
            let mut received = IndexMap::new();
            for k in 1..=n {
                if k != i {
                    received.insert(k, polys[(k - 1) as usize].share_for(i));
                }
            }
            let keyshare = compute_keyshare(&self_share, &received);

            // Arrival order does not matter
            received.reverse();
            assert_eq!(compute_keyshare(&self_share, &received), keyshare);

            assert_eq!(base_mul(&keyshare), public_keyshare(i, &commitments));
            keyshares.push(keyshare);
        }

        // The public key commits to the sum of every constant term
        let public_key = threshold_public_key(&commitments);
        let secret: Scalar = polys.iter().map(|p| p.evaluate(&Scalar::zero())).sum();
        assert_eq!(public_key, base_mul(&secret));
    }

    #[test]
    fn test_share_verification_serde() {
        let doc: IndexMap<u8, ShareVerification> =
            serde_json::from_str(r#"{"1": true, "2": false, "3": null}"#).unwrap();
        assert_eq!(doc[&1], ShareVerification::Passed);
        assert_eq!(doc[&2], ShareVerification::Failed);
        assert_eq!(doc[&3], ShareVerification::Pending);
        assert_eq!(
            serde_json::to_string(&doc).unwrap(),
            r#"{"1":true,"2":false,"3":null}"#
        );
    }

    #[test]
    fn test_encrypted_share() {
        let mut rng = ChaCha20Rng::from_seed([22u8; 32]);
        let (secret, public) = ecies::generate_keypair(&mut rng);
        let share = random_scalar(&mut rng);

        let sealed = EncryptedShare::seal(&mut rng, &public, &share).unwrap();
        assert_eq!(sealed.open(&secret, 1).unwrap(), share);

        let json = serde_json::to_string(&sealed).unwrap();
        let decoded: EncryptedShare = serde_json::from_str(&json).unwrap();
        assert_eq!(decoded, sealed);

        let (wrong, _) = ecies::generate_keypair(&mut rng);
        match sealed.open(&wrong, 4) {
            Err(Error::ShareDecryptionFailed(4)) => {}
            other => panic!("unexpected result: {:?}", other),
        }
    }
}
