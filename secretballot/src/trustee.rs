use crate::*;
use curve25519_dalek::ristretto::RistrettoPoint;
use curve25519_dalek::scalar::Scalar;
use indexmap::IndexMap;
use rand::{CryptoRng, RngCore};
use uuid::Uuid;
use zeroize::Zeroize;

/// A trustee is responsible for safeguarding a keyshare (a portion of the vote decryption key),
/// which it builds jointly with the other trustees through distributed key generation.
///
/// Most elections will have a handful of trustees (between 2 and 10). Every trustee must
/// take part in decryption.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct Trustee {
    pub id: Uuid,

    /// 1-based position in the trustee roster and the shuffle chain
    pub index: u8,

    /// Personal public key used to receive pairwise shares
    #[serde(with = "PointHex")]
    pub encryption_key: RistrettoPoint,
}

/// A trustee's personal secret key. Never transmitted; zeroed when dropped.
#[derive(Clone)]
pub struct TrusteeSecret(Scalar);

impl TrusteeSecret {
    pub fn from_scalar(scalar: Scalar) -> Self {
        TrusteeSecret(scalar)
    }

    pub fn from_hex(hex_str: &str) -> Result<Self, Error> {
        Ok(TrusteeSecret(scalar_from_hex(hex_str)?))
    }

    pub fn to_hex(&self) -> String {
        scalar_to_hex(&self.0)
    }

    pub fn public(&self) -> RistrettoPoint {
        base_mul(&self.0)
    }

    pub(crate) fn as_scalar(&self) -> &Scalar {
        &self.0
    }
}

impl Drop for TrusteeSecret {
    fn drop(&mut self) {
        self.0.zeroize();
    }
}

impl std::fmt::Debug for TrusteeSecret {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("TrusteeSecret(..)")
    }
}

impl Trustee {
    /// Create a new trustee
    pub fn new<R: RngCore + CryptoRng>(
        rng: &mut R,
        index: u8,
    ) -> Result<(Self, TrusteeSecret), Error> {
        if index == 0 {
            return Err(Error::InvalidParameters(
                "trustee index cannot be zero".to_owned(),
            ));
        }

        let (secret, public) = ecies::generate_keypair(rng);

        let trustee = Trustee {
            id: Uuid::new_v4(),
            index,
            encryption_key: public,
        };
        Ok((trustee, TrusteeSecret(secret)))
    }

    /// Build a trustee record around an existing secret key
    pub fn from_secret(index: u8, secret: &TrusteeSecret) -> Self {
        Trustee {
            id: Uuid::new_v4(),
            index,
            encryption_key: secret.public(),
        }
    }

    // Derive this trustee's polynomial from the secret key and election.
    // Re-derived whenever it is needed so it never has to be stored.
    fn polynomial(&self, secret: &TrusteeSecret, params: &ElectionParameters) -> PrivatePolynomial {
        use hkdf::Hkdf;
        use rand_core::SeedableRng;
        use rand_chacha::ChaCha20Rng;
        use sha2::Sha256;

        let h = Hkdf::<Sha256>::new(Some(params.election_id.as_bytes()), secret.0.as_bytes());
        let mut seed = [0u8; 32]; // 256 bits of security

        // 32 bytes is always a valid HKDF-SHA256 output length
        let _ = h.expand(b"secretballot_trustee_polynomial", &mut seed);

        let mut rng = ChaCha20Rng::from_seed(seed);
        seed.zeroize();

        PrivatePolynomial::random(&mut rng, params.threshold)
    }

    /// Feldman commitment to this trustee's polynomial
    pub fn keygen_commitment(
        &self,
        secret: &TrusteeSecret,
        params: &ElectionParameters,
    ) -> Commitment {
        self.polynomial(secret, params).commitment()
    }

    /// Evaluate the polynomial for every trustee.
    ///
    /// Returns the self-share (which never leaves this trustee) and the shares for everyone
    /// else, each encrypted to its recipient.
    pub fn generate_shares<R: RngCore + CryptoRng>(
        &self,
        rng: &mut R,
        secret: &TrusteeSecret,
        params: &ElectionParameters,
    ) -> Result<(Scalar, IndexMap<u8, EncryptedShare>), Error> {
        let polynomial = self.polynomial(secret, params);
        let self_share = polynomial.share_for(self.index);

        let mut shares = IndexMap::with_capacity(params.num_trustees());
        for recipient in params.trustees.iter() {
            if recipient.index == self.index {
                continue;
            }
            let share = polynomial.share_for(recipient.index);
            let encrypted = EncryptedShare::seal(rng, &recipient.encryption_key, &share)?;
            shares.insert(recipient.index, encrypted);
        }

        Ok((self_share, shares))
    }

    /// Decrypt a pairwise share addressed to this trustee
    pub fn decrypt_share(
        &self,
        secret: &TrusteeSecret,
        from: u8,
        share: &EncryptedShare,
    ) -> Result<Scalar, Error> {
        share.open(secret.as_scalar(), from)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand_chacha::ChaCha20Rng;

    #[test]
    fn trustee_test() {
        let mut rng = ChaCha20Rng::from_seed([30u8; 32]);

        let (trustee_1, skey_1) = Trustee::new(&mut rng, 1).unwrap();
        let (trustee_2, skey_2) = Trustee::new(&mut rng, 2).unwrap();
        let (trustee_3, skey_3) = Trustee::new(&mut rng, 3).unwrap();
        assert!(Trustee::new(&mut rng, 0).is_err());

        let params = ElectionParameters::new(
            Uuid::new_v4(),
            vec![trustee_1.clone(), trustee_2.clone(), trustee_3.clone()],
            3,
        )
        .unwrap();

        let trustees = [(&trustee_1, &skey_1), (&trustee_2, &skey_2), (&trustee_3, &skey_3)];

        // Commitments are stable across re-derivation
        let commitments: Vec<Commitment> = trustees
            .iter()
            .map(|(t, s)| t.keygen_commitment(s, &params))
            .collect();
        assert_eq!(commitments[0], trustee_1.keygen_commitment(&skey_1, &params));
        assert_eq!(commitments[0].len(), 3);

        let mut self_shares = Vec::new();
        let mut sent = Vec::new();
        for (t, s) in trustees.iter() {
            let (self_share, shares) = t.generate_shares(&mut rng, s, &params).unwrap();
            assert_eq!(shares.len(), 2);
            assert!(!shares.contains_key(&t.index));
            self_shares.push(self_share);
            sent.push(shares);
        }

        let public_key = threshold_public_key(&commitments);
        let mut keyshare_sum = Scalar::zero();

        for (t, s) in trustees.iter() {
            let mut received = IndexMap::new();
            for (from_position, shares) in sent.iter().enumerate() {
                let from = from_position as u8 + 1;
                if from == t.index {
                    continue;
                }
                let share = t.decrypt_share(s, from, &shares[&t.index]).unwrap();
                assert!(verify_share(&share, t.index, &commitments[from_position]));
                received.insert(from, share);
            }

            let keyshare = compute_keyshare(&self_shares[(t.index - 1) as usize], &received);
            assert_eq!(base_mul(&keyshare), public_keyshare(t.index, &commitments));
            keyshare_sum += keyshare;
        }

        // The public key is not simply the sum of keyshares, but every keyshare is consistent
        // with the same set of commitments.
        assert_ne!(base_mul(&keyshare_sum), RistrettoPoint::default());
        assert_ne!(public_key, RistrettoPoint::default());

        // A share sent to trustee 2 can't be opened by trustee 3
        assert!(trustee_3
            .decrypt_share(&skey_3, 1, &sent[0][&2u8])
            .is_err());
    }

    #[test]
    fn test_secret_hex() {
        let mut rng = ChaCha20Rng::from_seed([31u8; 32]);
        let (trustee, secret) = Trustee::new(&mut rng, 1).unwrap();

        let restored = TrusteeSecret::from_hex(&secret.to_hex()).unwrap();
        assert_eq!(restored.public(), trustee.encryption_key);
        assert_eq!(Trustee::from_secret(1, &restored).encryption_key, trustee.encryption_key);
        assert_eq!(format!("{:?}", restored), "TrusteeSecret(..)");
    }
}
