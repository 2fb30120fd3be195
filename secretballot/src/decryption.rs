use crate::transcript::{hash_to_point, Transcript};
use crate::*;
use curve25519_dalek::ristretto::RistrettoPoint;
use curve25519_dalek::scalar::Scalar;
use curve25519_dalek::traits::Identity;
use indexmap::IndexMap;
use rand::{CryptoRng, RngCore};
use rayon::prelude::*;
use uuid::Uuid;

/// Chaum-Pedersen proof that `partial = keyshare·lock` for the same keyshare behind
/// `public_keyshare = keyshare·G`.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
pub struct DecryptionProof {
    #[serde(with = "PointHex")]
    pub commitment_g: RistrettoPoint,

    #[serde(with = "PointHex")]
    pub commitment_lock: RistrettoPoint,

    #[serde(with = "ScalarHex")]
    pub response: Scalar,
}

/// One trustee's partial decryption of one ciphertext.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
pub struct PartialDecryption {
    #[serde(with = "PointHex")]
    pub partial: RistrettoPoint,
    pub proof: DecryptionProof,
}

fn proof_challenge(
    public_keyshare: &RistrettoPoint,
    lock: &RistrettoPoint,
    partial: &RistrettoPoint,
    commitment_g: &RistrettoPoint,
    commitment_lock: &RistrettoPoint,
) -> Scalar {
    let mut transcript = Transcript::new(b"secretballot_partial_decryption");
    transcript.append_point(public_keyshare);
    transcript.append_point(lock);
    transcript.append_point(partial);
    transcript.append_point(commitment_g);
    transcript.append_point(commitment_lock);
    transcript.challenge()
}

/// Partially decrypt a ciphertext lock with a keyshare and prove it was done honestly
pub fn partial_decrypt<R: RngCore + CryptoRng>(
    rng: &mut R,
    lock: &RistrettoPoint,
    keyshare: &Scalar,
) -> PartialDecryption {
    let partial = lock * keyshare;
    let public_keyshare = base_mul(keyshare);

    let nonce = random_scalar(rng);
    let commitment_g = base_mul(&nonce);
    let commitment_lock = lock * nonce;

    let c = proof_challenge(&public_keyshare, lock, &partial, &commitment_g, &commitment_lock);
    let response = nonce + c * keyshare;

    PartialDecryption {
        partial,
        proof: DecryptionProof {
            commitment_g,
            commitment_lock,
            response,
        },
    }
}

/// Verify a partial decryption against the public image of the trustee's keyshare
pub fn verify_partial(
    lock: &RistrettoPoint,
    public_keyshare: &RistrettoPoint,
    partial: &PartialDecryption,
) -> bool {
    let proof = &partial.proof;
    let c = proof_challenge(
        public_keyshare,
        lock,
        &partial.partial,
        &proof.commitment_g,
        &proof.commitment_lock,
    );

    base_mul(&proof.response) == proof.commitment_g + public_keyshare * c
        && lock * proof.response == proof.commitment_lock + partial.partial * c
}

/// Lagrange coefficient at zero for `index` over the full set of trustee `indexes`
pub fn lagrange_coefficient(index: u8, indexes: &[u8]) -> Scalar {
    let x_i = index_scalar(index);
    let mut numerator = Scalar::one();
    let mut denominator = Scalar::one();
    for &j in indexes.iter().filter(|&&j| j != index) {
        let x_j = index_scalar(j);
        numerator *= x_j;
        denominator *= x_j - x_i;
    }
    numerator * denominator.invert()
}

/// Combine one partial decryption from every trustee into the ElGamal shared secret.
///
/// Each partial is weighted by its trustee's Lagrange coefficient, which folds the keyshares
/// back into the sum of every polynomial's constant term.
pub fn combine_partials(partials: &[(u8, RistrettoPoint)]) -> Result<RistrettoPoint, Error> {
    let indexes: Vec<u8> = partials.iter().map(|(index, _)| *index).collect();
    for (position, index) in indexes.iter().enumerate() {
        if *index == 0 || indexes[..position].contains(index) {
            return Err(Error::malformed(format!(
                "invalid or repeated trustee index {} among partials",
                index
            )));
        }
    }

    Ok(partials
        .iter()
        .fold(RistrettoPoint::identity(), |acc, (index, partial)| {
            acc + partial * lagrange_coefficient(*index, &indexes)
        }))
}

// Every trustee with a public keyshare must have supplied one partial per ciphertext
fn check_complete(
    ciphertexts: &[Ciphertext],
    partials: &IndexMap<u8, Vec<PartialDecryption>>,
    public_keyshares: &IndexMap<u8, RistrettoPoint>,
) -> Result<(), Error> {
    let n = public_keyshares.len();
    let complete = public_keyshares
        .keys()
        .filter(|index| {
            partials
                .get(*index)
                .map(|p| p.len() == ciphertexts.len())
                .unwrap_or(false)
        })
        .count();
    if complete < n {
        return Err(Error::NotEnoughPartials(n, complete));
    }
    Ok(())
}

/// Verify every trustee's partials for a column.
///
/// All `n` trustees must have supplied one partial per ciphertext. Any failing proof refuses
/// the whole column.
pub fn verify_column_partials(
    column: &str,
    ciphertexts: &[Ciphertext],
    partials: &IndexMap<u8, Vec<PartialDecryption>>,
    public_keyshares: &IndexMap<u8, RistrettoPoint>,
    parallel: bool,
) -> Result<(), Error> {
    check_complete(ciphertexts, partials, public_keyshares)?;

    for (trustee, public_keyshare) in public_keyshares.iter() {
        let trustee_partials = &partials[trustee];
        let check = |(row, (ciphertext, partial)): (usize, (&Ciphertext, &PartialDecryption))| {
            if verify_partial(&ciphertext.lock, public_keyshare, partial) {
                None
            } else {
                Some(row)
            }
        };

        let rows = ciphertexts.iter().zip(trustee_partials.iter());
        let failed = if parallel {
            rows.collect::<Vec<_>>()
                .into_par_iter()
                .enumerate()
                .filter_map(check)
                .min()
        } else {
            rows.enumerate().filter_map(check).next()
        };

        if let Some(row) = failed {
            error!(
                "partial decryption proof from trustee {} failed for column '{}' row {}",
                trustee, column, row
            );
            return Err(Error::PartialProofInvalid {
                trustee: *trustee,
                column: column.to_owned(),
                row,
            });
        }
    }

    Ok(())
}

/// Combine already verified partials and decode each row.
///
/// Decoding never fails: a voter may have encrypted any group element, so invalid UTF-8 is
/// replaced and an unreadable embedding decodes to the empty string. Recombination then sets
/// such rows aside.
pub fn combine_column(
    column: &str,
    ciphertexts: &[Ciphertext],
    partials: &IndexMap<u8, Vec<PartialDecryption>>,
    public_keyshares: &IndexMap<u8, RistrettoPoint>,
) -> Result<Vec<String>, Error> {
    check_complete(ciphertexts, partials, public_keyshares)?;

    let mut decrypted = Vec::with_capacity(ciphertexts.len());
    for (row, ciphertext) in ciphertexts.iter().enumerate() {
        let row_partials: Vec<(u8, RistrettoPoint)> = public_keyshares
            .keys()
            .map(|index| (*index, partials[index][row].partial))
            .collect();
        let shared_secret = combine_partials(&row_partials)?;

        let value = match extract(&ciphertext.unlock(&shared_secret)) {
            Ok(bytes) => String::from_utf8_lossy(&bytes).into_owned(),
            Err(e) => {
                warn!("column '{}' row {}: {}", column, row, e);
                String::new()
            }
        };
        decrypted.push(value);
    }

    debug!("decrypted {} rows of column '{}'", decrypted.len(), column);
    Ok(decrypted)
}

/// Verify every trustee's partials for a column, then combine and decode each row
pub fn decrypt_column(
    column: &str,
    ciphertexts: &[Ciphertext],
    partials: &IndexMap<u8, Vec<PartialDecryption>>,
    public_keyshares: &IndexMap<u8, RistrettoPoint>,
    parallel: bool,
) -> Result<Vec<String>, Error> {
    verify_column_partials(column, ciphertexts, partials, public_keyshares, parallel)?;
    combine_column(column, ciphertexts, partials, public_keyshares)
}

/// A fixed lock every trustee partially decrypts once its keyshare is ready, so the others
/// can confirm the keyshare matches the published commitments before any votes are touched.
pub fn keyshare_test_lock(election_id: &Uuid) -> RistrettoPoint {
    let mut seed = b"secretballot_keyshare_test".to_vec();
    seed.extend_from_slice(election_id.as_bytes());
    hash_to_point(&seed)
}
