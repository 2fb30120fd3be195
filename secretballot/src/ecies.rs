//! ECIES over Ristretto255: an integrated encryption scheme used to carry pairwise key shares
//! from one trustee to another.
//!
//! The receiver's key is a plain Ristretto keypair (`x`, `x·G`). The sender picks an ephemeral
//! scalar, derives an AES-256-GCM key from the ephemeral public key and the Diffie-Hellman
//! shared point with HKDF-SHA256, and sends `ephemeral_pk || nonce || aes_ciphertext`.

use crate::*;
use aes_gcm::aead::{generic_array::GenericArray, Aead, NewAead};
use aes_gcm::Aes256Gcm;
use curve25519_dalek::ristretto::RistrettoPoint;
use curve25519_dalek::scalar::Scalar;
use hkdf::Hkdf;
use rand::{CryptoRng, RngCore};
use sha2::Sha256;

const AES_IV_LENGTH: usize = 12;

// AES-GCM authentication tag
const AES_TAG_LENGTH: usize = 16;

const HKDF_INFO: &[u8] = b"secretballot_ecies_share";

type AesKey = [u8; 32];
type SharedSecret = [u8; 32];

/// Generate a keypair, ready for use in ECIES
pub fn generate_keypair<R: RngCore + CryptoRng>(rng: &mut R) -> (Scalar, RistrettoPoint) {
    let secret = random_scalar(rng);
    (secret, base_mul(&secret))
}

/// Encrypt a message using ECIES, it can only be decrypted by the receiver's secret key.
pub fn encrypt<R: RngCore + CryptoRng>(
    rng: &mut R,
    receiver_pub: &RistrettoPoint,
    msg: &[u8],
) -> Result<Vec<u8>, Error> {
    let (ephemeral_sk, ephemeral_pk) = generate_keypair(rng);

    let aes_key = encapsulate(&ephemeral_sk, &ephemeral_pk, receiver_pub);
    let encrypted = aes_encrypt(rng, &aes_key, msg)?;

    let mut cipher_text = Vec::with_capacity(ELEMENT_LENGTH + encrypted.len());
    cipher_text.extend(ephemeral_pk.compress().as_bytes());
    cipher_text.extend(encrypted);

    Ok(cipher_text)
}

/// Decrypt a ECIES encrypted ciphertext using the receiver's secret key.
pub fn decrypt(receiver_sec: &Scalar, msg: &[u8]) -> Result<Vec<u8>, Error> {
    if msg.len() < ELEMENT_LENGTH + AES_IV_LENGTH + AES_TAG_LENGTH {
        return Err(Error::Ecies("ciphertext too short"));
    }

    let ephemeral_pk = point_from_bytes(&msg[..ELEMENT_LENGTH])
        .map_err(|_| Error::Ecies("invalid ephemeral public key"))?;
    let encrypted = &msg[ELEMENT_LENGTH..];
    let aes_key = decapsulate(receiver_sec, &ephemeral_pk);

    aes_decrypt(&aes_key, encrypted)
}

fn hkdf_sha256(master: &[u8]) -> AesKey {
    let h = Hkdf::<Sha256>::new(None, master);
    let mut out = [0u8; 32];

    // 32 bytes is always a valid HKDF-SHA256 output length
    let _ = h.expand(HKDF_INFO, &mut out);
    out
}

fn generate_shared(secret: &Scalar, public: &RistrettoPoint) -> SharedSecret {
    (public * secret).compress().to_bytes()
}

fn derive_key(ephemeral_pk: &RistrettoPoint, shared_point: &SharedSecret) -> AesKey {
    let mut master = Vec::with_capacity(32 * 2);
    master.extend(ephemeral_pk.compress().as_bytes());
    master.extend(shared_point.iter());
    hkdf_sha256(master.as_slice())
}

fn encapsulate(
    ephemeral_sk: &Scalar,
    ephemeral_pk: &RistrettoPoint,
    peer_pk: &RistrettoPoint,
) -> AesKey {
    let shared_point = generate_shared(ephemeral_sk, peer_pk);
    derive_key(ephemeral_pk, &shared_point)
}

fn decapsulate(sk: &Scalar, ephemeral_pk: &RistrettoPoint) -> AesKey {
    let shared_point = generate_shared(sk, ephemeral_pk);
    derive_key(ephemeral_pk, &shared_point)
}

fn aes_encrypt<R: RngCore + CryptoRng>(
    rng: &mut R,
    key: &AesKey,
    msg: &[u8],
) -> Result<Vec<u8>, Error> {
    let aead = Aes256Gcm::new(GenericArray::from_slice(key));

    let mut nonce = [0u8; AES_IV_LENGTH];
    rng.fill_bytes(&mut nonce);
    let nonce = GenericArray::from_slice(&nonce);

    let ciphertext = aead
        .encrypt(nonce, msg)
        .map_err(|_| Error::Ecies("encryption failure"))?;

    let mut output = Vec::with_capacity(AES_IV_LENGTH + ciphertext.len());
    output.extend(nonce);
    output.extend(ciphertext);

    Ok(output)
}

fn aes_decrypt(key: &AesKey, ciphertext: &[u8]) -> Result<Vec<u8>, Error> {
    let aead = Aes256Gcm::new(GenericArray::from_slice(key));

    let nonce = GenericArray::from_slice(&ciphertext[..AES_IV_LENGTH]);
    let encrypted = &ciphertext[AES_IV_LENGTH..];

    aead.decrypt(nonce, encrypted)
        .map_err(|_| Error::Ecies("authentication failure"))
}

#[cfg(test)]
pub mod tests {
    use super::*;
    use rand::{thread_rng, Rng};

    #[test]
    fn test_shared() {
        let mut rng = thread_rng();
        let (emphemeral_sk, emphemeral_pk) = generate_keypair(&mut rng);
        let (peer_sk, peer_pk) = generate_keypair(&mut rng);

        assert_eq!(
            generate_shared(&emphemeral_sk, &peer_pk),
            generate_shared(&peer_sk, &emphemeral_pk)
        );

        // Make sure it fails when wrong keys used
        assert_ne!(
            generate_shared(&emphemeral_sk, &emphemeral_pk),
            generate_shared(&peer_sk, &peer_pk)
        )
    }

    #[test]
    fn test_encapsulation() {
        let mut rng = thread_rng();
        let (emphemeral_sk, emphemeral_pk) = generate_keypair(&mut rng);
        let (peer_sk, peer_pk) = generate_keypair(&mut rng);

        assert_eq!(
            encapsulate(&emphemeral_sk, &emphemeral_pk, &peer_pk),
            decapsulate(&peer_sk, &emphemeral_pk)
        )
    }

    #[test]
    fn test_aes() {
        let mut rng = thread_rng();
        let mut key = [0u8; 32];
        rng.fill(&mut key);

        let plaintext = b"ABOLISH ICE";
        let encrypted = aes_encrypt(&mut rng, &key, plaintext).unwrap();
        let decrypted = aes_decrypt(&key, &encrypted).unwrap();

        assert_eq!(plaintext, decrypted.as_slice());
    }

    #[test]
    fn test_ecies_ristretto() {
        let mut rng = thread_rng();
        let (peer_sk, peer_pk) = generate_keypair(&mut rng);

        let plaintext = b"ABOLISH ICE";

        let encrypted = encrypt(&mut rng, &peer_pk, plaintext).unwrap();
        let decrypted = decrypt(&peer_sk, &encrypted).unwrap();

        assert_eq!(plaintext, decrypted.as_slice());

        // Test that it fails when using a bad secret key
        let (bad_sk, _) = generate_keypair(&mut rng);
        assert!(decrypt(&bad_sk, &encrypted).is_err());

        // Truncated and tampered ciphertexts are rejected
        assert!(decrypt(&peer_sk, &encrypted[..40]).is_err());
        let mut tampered = encrypted.clone();
        let last = tampered.len() - 1;
        tampered[last] ^= 1;
        assert!(decrypt(&peer_sk, &tampered).is_err());
    }
}
