//! Verifiable re-encryption mixnet.
//!
//! A shuffle permutes a column of ciphertexts and re-encrypts every entry, then proves it did
//! so with a Terelius-Wikström proof of shuffle, made non-interactive with Fiat-Shamir.
//! The output convention is `output[i] = reencrypt(input[ψ(i)], r̃_i)`.

use crate::transcript::{hash_to_point, Transcript};
use crate::*;
use curve25519_dalek::ristretto::RistrettoPoint;
use curve25519_dalek::scalar::Scalar;
use curve25519_dalek::traits::{MultiscalarMul, VartimeMultiscalarMul};
use rand::seq::SliceRandom;
use rand::{CryptoRng, RngCore};
use uuid::Uuid;
use zeroize::Zeroize;

/// Everything a shuffle proof is bound to besides the ciphertexts and public key.
///
/// The Pedersen generators used by the proof are derived from this context, so a proof made
/// for one trustee or column can never be replayed for another.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct ShuffleContext {
    pub election_id: Uuid,
    pub trustee_index: u8,
    pub column: String,
}

impl ShuffleContext {
    pub fn new(election_id: Uuid, trustee_index: u8, column: &str) -> Self {
        ShuffleContext {
            election_id,
            trustee_index,
            column: column.to_owned(),
        }
    }

    fn seed(&self) -> Vec<u8> {
        let mut seed = b"secretballot_shuffle".to_vec();
        seed.extend_from_slice(self.election_id.as_bytes());
        seed.extend_from_slice(&[self.trustee_index]);
        seed.extend_from_slice(&(self.column.len() as u64).to_be_bytes());
        seed.extend_from_slice(self.column.as_bytes());

        seed
    }

    /// Independent generators `h` and `h_1 .. h_n`, nobody knows their discrete logs
    fn generators(&self, n: usize) -> (RistrettoPoint, Vec<RistrettoPoint>) {
        let seed = self.seed();

        let mut h_seed = seed.clone();
        h_seed.extend_from_slice(b"h");
        let h = hash_to_point(&h_seed);

        let hs = (0..n)
            .map(|i| {
                let mut hi_seed = seed.clone();
                hi_seed.extend_from_slice(b"h_i");
                hi_seed.extend_from_slice(&(i as u64).to_be_bytes());
                hash_to_point(&hi_seed)
            })
            .collect();

        (h, hs)
    }
}

/// Non-interactive proof that a ciphertext column is a permutation and re-encryption of
/// another.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct ShuffleProof {
    /// Commitment to the permutation
    #[serde(with = "point_vec_hex")]
    pub permutation_commitments: Vec<RistrettoPoint>,

    /// Commitment chain over the permuted challenges
    #[serde(with = "point_vec_hex")]
    pub chain_commitments: Vec<RistrettoPoint>,

    #[serde(with = "PointHex")]
    pub t1: RistrettoPoint,
    #[serde(with = "PointHex")]
    pub t2: RistrettoPoint,
    #[serde(with = "PointHex")]
    pub t3: RistrettoPoint,
    #[serde(with = "PointHex")]
    pub t4_encrypted: RistrettoPoint,
    #[serde(with = "PointHex")]
    pub t4_lock: RistrettoPoint,
    #[serde(with = "point_vec_hex")]
    pub t_hat: Vec<RistrettoPoint>,

    #[serde(with = "ScalarHex")]
    pub s1: Scalar,
    #[serde(with = "ScalarHex")]
    pub s2: Scalar,
    #[serde(with = "ScalarHex")]
    pub s3: Scalar,
    #[serde(with = "ScalarHex")]
    pub s4: Scalar,
    #[serde(with = "scalar_vec_hex")]
    pub s_hat: Vec<Scalar>,
    #[serde(with = "scalar_vec_hex")]
    pub s_prime: Vec<Scalar>,
}

/// The secret randomness behind a shuffle, from which its proof can be produced later.
///
/// Zeroed when dropped. Holding on to it is what lets a fast shuffle publish its output first
/// and its proof afterwards.
pub struct ShuffleWitness {
    /// `output[i]` came from `input[permutation[i]]`
    permutation: Vec<usize>,

    /// `r_j` of the permutation commitment `c_j`
    commitment_randomizers: Vec<Scalar>,

    /// `r̃_i` folded into `output[i]`
    reencryption_randomizers: Vec<Scalar>,
}

impl ShuffleWitness {
    pub fn len(&self) -> usize {
        self.permutation.len()
    }

    pub fn is_empty(&self) -> bool {
        self.permutation.is_empty()
    }
}

impl Drop for ShuffleWitness {
    fn drop(&mut self) {
        self.permutation.zeroize();
        self.commitment_randomizers.zeroize();
        self.reencryption_randomizers.zeroize();
    }
}

/// Do a mixnet shuffle and prove it.
///
/// This is an expensive and time-consuming operation, so should ideally be offloaded to its own thread
pub fn shuffle<R: RngCore + CryptoRng>(
    rng: &mut R,
    public_key: &RistrettoPoint,
    input: &[Ciphertext],
    context: &ShuffleContext,
) -> Result<(Vec<Ciphertext>, ShuffleProof), Error> {
    let (output, witness) = shuffle_deferred(rng, public_key, input)?;
    let proof = prove(rng, public_key, input, &output, &witness, context)?;
    Ok((output, proof))
}

/// Shuffle and re-encrypt without building the proof, keeping the witness for `prove`
pub fn shuffle_deferred<R: RngCore + CryptoRng>(
    rng: &mut R,
    public_key: &RistrettoPoint,
    input: &[Ciphertext],
) -> Result<(Vec<Ciphertext>, ShuffleWitness), Error> {
    let n = input.len();
    if n == 0 {
        return Err(Error::EmptyShuffle);
    }

    let mut permutation: Vec<usize> = (0..n).collect();
    permutation.shuffle(rng);

    let reencryption_randomizers: Vec<Scalar> = (0..n).map(|_| random_scalar(rng)).collect();
    let commitment_randomizers: Vec<Scalar> = (0..n).map(|_| random_scalar(rng)).collect();

    let output = permutation
        .iter()
        .zip(reencryption_randomizers.iter())
        .map(|(&j, r)| input[j].reencrypt(public_key, r))
        .collect();

    let witness = ShuffleWitness {
        permutation,
        commitment_randomizers,
        reencryption_randomizers,
    };

    Ok((output, witness))
}

// Challenges u_1 .. u_n, bound to everything the prover has committed to so far
fn permutation_challenges(
    public_key: &RistrettoPoint,
    input: &[Ciphertext],
    output: &[Ciphertext],
    permutation_commitments: &[RistrettoPoint],
    context: &ShuffleContext,
) -> (Transcript, Vec<Scalar>) {
    let mut transcript = Transcript::new(b"secretballot_shuffle_proof");
    transcript.append_bytes(&context.seed());
    transcript.append_point(public_key);
    transcript.append_points(input.iter().map(|c| &c.lock));
    transcript.append_points(input.iter().map(|c| &c.encrypted));
    transcript.append_points(output.iter().map(|c| &c.lock));
    transcript.append_points(output.iter().map(|c| &c.encrypted));
    transcript.append_points(permutation_commitments);

    let challenges = (0..input.len())
        .map(|i| transcript.indexed_challenge(i as u64))
        .collect();

    (transcript, challenges)
}

#[allow(clippy::too_many_arguments)]
fn proof_challenge(
    mut transcript: Transcript,
    chain_commitments: &[RistrettoPoint],
    t1: &RistrettoPoint,
    t2: &RistrettoPoint,
    t3: &RistrettoPoint,
    t4_encrypted: &RistrettoPoint,
    t4_lock: &RistrettoPoint,
    t_hat: &[RistrettoPoint],
) -> Scalar {
    transcript.append_points(chain_commitments);
    transcript.append_point(t1);
    transcript.append_point(t2);
    transcript.append_point(t3);
    transcript.append_point(t4_encrypted);
    transcript.append_point(t4_lock);
    transcript.append_points(t_hat);
    transcript.challenge()
}

/// Build the proof for a shuffle previously produced by `shuffle_deferred`
pub fn prove<R: RngCore + CryptoRng>(
    rng: &mut R,
    public_key: &RistrettoPoint,
    input: &[Ciphertext],
    output: &[Ciphertext],
    witness: &ShuffleWitness,
    context: &ShuffleContext,
) -> Result<ShuffleProof, Error> {
    let n = input.len();
    if n == 0 {
        return Err(Error::EmptyShuffle);
    }
    if output.len() != n {
        return Err(Error::MismatchedLength(n, output.len()));
    }
    if witness.len() != n {
        return Err(Error::MismatchedLength(n, witness.len()));
    }

    let psi = &witness.permutation;
    let r = &witness.commitment_randomizers;
    let r_tilde = &witness.reencryption_randomizers;
    let g = generator();
    let (h, hs) = context.generators(n);

    // c_{ψ(i)} = r_{ψ(i)}·G + h_i
    let mut permutation_commitments = vec![RistrettoPoint::default(); n];
    for (i, &j) in psi.iter().enumerate() {
        permutation_commitments[j] = base_mul(&r[j]) + hs[i];
    }

    let (transcript, u) =
        permutation_challenges(public_key, input, output, &permutation_commitments, context);
    let u_prime: Vec<Scalar> = psi.iter().map(|&j| u[j]).collect();

    // ĉ_0 = h, ĉ_i = r̂_i·G + u'_i·ĉ_{i-1}
    let r_hat: Vec<Scalar> = (0..n).map(|_| random_scalar(rng)).collect();
    let mut chain_commitments = Vec::with_capacity(n);
    let mut previous = h;
    for i in 0..n {
        let current = base_mul(&r_hat[i]) + previous * u_prime[i];
        chain_commitments.push(current);
        previous = current;
    }

    // Aggregate witness values
    let r_bar = sum_scalars(r.iter());
    let mut v = Scalar::one();
    let mut r_hat_sum = Scalar::zero();
    for i in (0..n).rev() {
        r_hat_sum += r_hat[i] * v;
        v *= u_prime[i];
    }
    let r_u: Scalar = r.iter().zip(u.iter()).map(|(r, u)| r * u).sum();
    let r_tilde_u: Scalar = r_tilde.iter().zip(u_prime.iter()).map(|(r, u)| r * u).sum();

    // Proof commitments
    let omega1 = random_scalar(rng);
    let omega2 = random_scalar(rng);
    let omega3 = random_scalar(rng);
    let omega4 = random_scalar(rng);
    let omega_hat: Vec<Scalar> = (0..n).map(|_| random_scalar(rng)).collect();
    let omega_prime: Vec<Scalar> = (0..n).map(|_| random_scalar(rng)).collect();

    let t1 = base_mul(&omega1);
    let t2 = base_mul(&omega2);
    let t3 = base_mul(&omega3) + RistrettoPoint::multiscalar_mul(&omega_prime, &hs);
    let t4_encrypted = RistrettoPoint::multiscalar_mul(
        omega_prime.iter().chain(std::iter::once(&-omega4)),
        output
            .iter()
            .map(|c| &c.encrypted)
            .chain(std::iter::once(public_key)),
    );
    let t4_lock = RistrettoPoint::multiscalar_mul(
        omega_prime.iter().chain(std::iter::once(&-omega4)),
        output.iter().map(|c| &c.lock).chain(std::iter::once(&g)),
    );

    let mut t_hat = Vec::with_capacity(n);
    let mut previous = h;
    for i in 0..n {
        t_hat.push(base_mul(&omega_hat[i]) + previous * omega_prime[i]);
        previous = chain_commitments[i];
    }

    let c = proof_challenge(
        transcript,
        &chain_commitments,
        &t1,
        &t2,
        &t3,
        &t4_encrypted,
        &t4_lock,
        &t_hat,
    );

    let s1 = omega1 - c * r_bar;
    let s2 = omega2 - c * r_hat_sum;
    let s3 = omega3 - c * r_u;
    let s4 = omega4 - c * r_tilde_u;
    let s_hat = (0..n).map(|i| omega_hat[i] - c * r_hat[i]).collect();
    let s_prime = (0..n).map(|i| omega_prime[i] - c * u_prime[i]).collect();

    Ok(ShuffleProof {
        permutation_commitments,
        chain_commitments,
        t1,
        t2,
        t3,
        t4_encrypted,
        t4_lock,
        t_hat,
        s1,
        s2,
        s3,
        s4,
        s_hat,
        s_prime,
    })
}

/// Verify mixnet shuffle
pub fn verify_shuffle(
    public_key: &RistrettoPoint,
    input: &[Ciphertext],
    output: &[Ciphertext],
    proof: &ShuffleProof,
    context: &ShuffleContext,
) -> bool {
    let n = input.len();
    if n == 0
        || output.len() != n
        || proof.permutation_commitments.len() != n
        || proof.chain_commitments.len() != n
        || proof.t_hat.len() != n
        || proof.s_hat.len() != n
        || proof.s_prime.len() != n
    {
        return false;
    }

    let g = generator();
    let (h, hs) = context.generators(n);

    let (transcript, u) = permutation_challenges(
        public_key,
        input,
        output,
        &proof.permutation_commitments,
        context,
    );

    let c = proof_challenge(
        transcript,
        &proof.chain_commitments,
        &proof.t1,
        &proof.t2,
        &proof.t3,
        &proof.t4_encrypted,
        &proof.t4_lock,
        &proof.t_hat,
    );

    // c̄ = Σ c_i − Σ h_i
    let c_bar = sum_points(proof.permutation_commitments.iter()) - sum_points(hs.iter());

    // ĉ = ĉ_n − (Π u_i)·h
    let u_product = u.iter().fold(Scalar::one(), |acc, u| acc * u);
    let c_hat = proof.chain_commitments[n - 1] - h * u_product;

    // c̃ = Σ u_i·c_i
    let c_tilde = RistrettoPoint::vartime_multiscalar_mul(&u, &proof.permutation_commitments);

    // a' = Σ u_i·e_i
    let a_encrypted =
        RistrettoPoint::vartime_multiscalar_mul(&u, input.iter().map(|e| &e.encrypted));
    let a_lock = RistrettoPoint::vartime_multiscalar_mul(&u, input.iter().map(|e| &e.lock));

    if proof.t1 != c_bar * c + base_mul(&proof.s1) {
        return false;
    }

    if proof.t2 != c_hat * c + base_mul(&proof.s2) {
        return false;
    }

    let t3 = c_tilde * c
        + base_mul(&proof.s3)
        + RistrettoPoint::vartime_multiscalar_mul(&proof.s_prime, &hs);
    if proof.t3 != t3 {
        return false;
    }

    let neg_s4 = -proof.s4;
    let t4_encrypted = a_encrypted * c
        + RistrettoPoint::vartime_multiscalar_mul(
            proof.s_prime.iter().chain(std::iter::once(&neg_s4)),
            output
                .iter()
                .map(|e| &e.encrypted)
                .chain(std::iter::once(public_key)),
        );
    if proof.t4_encrypted != t4_encrypted {
        return false;
    }

    let t4_lock = a_lock * c
        + RistrettoPoint::vartime_multiscalar_mul(
            proof.s_prime.iter().chain(std::iter::once(&neg_s4)),
            output.iter().map(|e| &e.lock).chain(std::iter::once(&g)),
        );
    if proof.t4_lock != t4_lock {
        return false;
    }

    let mut previous = h;
    for i in 0..n {
        let expected = proof.chain_commitments[i] * c
            + base_mul(&proof.s_hat[i])
            + previous * proof.s_prime[i];
        if proof.t_hat[i] != expected {
            return false;
        }
        previous = proof.chain_commitments[i];
    }

    true
}
