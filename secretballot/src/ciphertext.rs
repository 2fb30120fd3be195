use crate::*;
use curve25519_dalek::ristretto::RistrettoPoint;
use curve25519_dalek::scalar::Scalar;
use rand::{CryptoRng, RngCore};

/// An ElGamal ciphertext over Ristretto255.
///
/// `lock` is the ephemeral public component (`r·G`) and `encrypted` is the masked message
/// (`m + r·PK`). Ciphertexts are never mutated; re-encryption produces a new value.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
pub struct Ciphertext {
    #[serde(with = "PointHex")]
    pub lock: RistrettoPoint,

    #[serde(with = "PointHex")]
    pub encrypted: RistrettoPoint,
}

impl Ciphertext {
    /// Encrypt a message element under `public_key` with the given randomizer
    pub fn encrypt(
        public_key: &RistrettoPoint,
        randomizer: &Scalar,
        message: &RistrettoPoint,
    ) -> Self {
        Ciphertext {
            lock: base_mul(randomizer),
            encrypted: message + public_key * randomizer,
        }
    }

    /// Encrypt a message element with a fresh random randomizer
    pub fn encrypt_random<R: RngCore + CryptoRng>(
        rng: &mut R,
        public_key: &RistrettoPoint,
        message: &RistrettoPoint,
    ) -> Self {
        let randomizer = random_scalar(rng);
        Self::encrypt(public_key, &randomizer, message)
    }

    /// Embed and encrypt a short string
    pub fn encrypt_str<R: RngCore + CryptoRng>(
        rng: &mut R,
        public_key: &RistrettoPoint,
        message: &str,
    ) -> Result<Self, Error> {
        let point = embed_str(rng, message)?;
        Ok(Self::encrypt_random(rng, public_key, &point))
    }

    /// Decrypt with the full private key.
    ///
    /// Only meaningful in single-trustee configurations, where one party holds the whole key.
    pub fn decrypt(&self, private_key: &Scalar) -> RistrettoPoint {
        self.unlock(&(self.lock * private_key))
    }

    /// Fold a fresh randomizer into this ciphertext
    pub fn reencrypt(&self, public_key: &RistrettoPoint, randomizer: &Scalar) -> Self {
        Ciphertext {
            lock: self.lock + base_mul(randomizer),
            encrypted: self.encrypted + public_key * randomizer,
        }
    }

    /// Remove the ElGamal shared secret, recovering the message element
    pub fn unlock(&self, shared_secret: &RistrettoPoint) -> RistrettoPoint {
        self.encrypted - shared_secret
    }

    /// Canonical 64 byte encoding: lock followed by encrypted
    pub fn to_bytes(&self) -> [u8; 64] {
        let mut bytes = [0u8; 64];
        bytes[..32].copy_from_slice(self.lock.compress().as_bytes());
        bytes[32..].copy_from_slice(self.encrypted.compress().as_bytes());
        bytes
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self, Error> {
        if bytes.len() != 64 {
            return Err(Error::MalformedInput(format!(
                "ciphertext must be 64 bytes, found {}",
                bytes.len()
            )));
        }

        Ok(Ciphertext {
            lock: point_from_bytes(&bytes[..32])?,
            encrypted: point_from_bytes(&bytes[32..])?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand_chacha::ChaCha20Rng;

    #[test]
    fn test_encrypt_decrypt() {
        let mut rng = ChaCha20Rng::from_seed([1u8; 32]);
        let private_key = random_scalar(&mut rng);
        let public_key = base_mul(&private_key);

        let message = embed_str(&mut rng, "ABOLISH ICE").unwrap();
        let randomizer = random_scalar(&mut rng);
        let ciphertext = Ciphertext::encrypt(&public_key, &randomizer, &message);

        assert_eq!(ciphertext.lock, base_mul(&randomizer));
        assert_eq!(ciphertext.decrypt(&private_key), message);

        // Wrong key does not decrypt
        let wrong_key = random_scalar(&mut rng);
        assert_ne!(ciphertext.decrypt(&wrong_key), message);
    }

    #[test]
    fn test_reencrypt() {
        let mut rng = ChaCha20Rng::from_seed([2u8; 32]);
        let private_key = random_scalar(&mut rng);
        let public_key = base_mul(&private_key);

        let ciphertext = Ciphertext::encrypt_str(&mut rng, &public_key, "Barak Obama").unwrap();
        let reencrypted = ciphertext.reencrypt(&public_key, &random_scalar(&mut rng));

        assert_ne!(ciphertext, reencrypted);
        assert_eq!(extract_str(&reencrypted.decrypt(&private_key)).unwrap(), "Barak Obama");
    }

    #[test]
    fn test_serialization() {
        let mut rng = ChaCha20Rng::from_seed([3u8; 32]);
        let public_key = base_mul(&random_scalar(&mut rng));
        let ciphertext = Ciphertext::encrypt_str(&mut rng, &public_key, "yes").unwrap();

        let json = serde_json::to_value(&ciphertext).unwrap();
        assert_eq!(json["lock"], point_to_hex(&ciphertext.lock));
        assert_eq!(json["encrypted"], point_to_hex(&ciphertext.encrypted));
        let decoded: Ciphertext = serde_json::from_value(json).unwrap();
        assert_eq!(decoded, ciphertext);

        assert_eq!(Ciphertext::from_bytes(&ciphertext.to_bytes()).unwrap(), ciphertext);
        assert!(Ciphertext::from_bytes(&[0u8; 63]).is_err());
    }
}
