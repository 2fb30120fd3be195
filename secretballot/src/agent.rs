use crate::*;
use curve25519_dalek::ristretto::RistrettoPoint;
use curve25519_dalek::scalar::Scalar;
use indexmap::IndexMap;
use rand::{CryptoRng, RngCore};

// A fast shuffle held back until its proof is requested
struct PendingShuffle {
    public_key: RistrettoPoint,
    input: Vec<Ciphertext>,
    output: Vec<Ciphertext>,
    witness: ShuffleWitness,
}

/// Acts on behalf of one trustee.
///
/// The agent owns the trustee's secret key and private document. It turns instructions
/// addressed to its trustee into submissions, and never touches storage or the network.
pub struct TrusteeAgent {
    trustee: Trustee,
    secret: TrusteeSecret,
    params: ElectionParameters,
    private: PrivateDocument,
    pending: IndexMap<String, PendingShuffle>,
}

impl TrusteeAgent {
    pub fn new(
        trustee: Trustee,
        secret: TrusteeSecret,
        params: ElectionParameters,
    ) -> Result<Self, Error> {
        Self::with_private(trustee, secret, params, PrivateDocument::default())
    }

    /// Resume an agent from a previously stored private document
    pub fn with_private(
        trustee: Trustee,
        secret: TrusteeSecret,
        params: ElectionParameters,
        private: PrivateDocument,
    ) -> Result<Self, Error> {
        match params.get_trustee(trustee.index) {
            Some(published) if published.encryption_key == secret.public() => {}
            Some(_) => {
                return Err(Error::InvalidParameters(format!(
                    "secret key does not match trustee {}",
                    trustee.index
                )))
            }
            None => return Err(Error::TrusteeDoesNotExist(trustee.index)),
        }

        Ok(TrusteeAgent {
            trustee,
            secret,
            params,
            private,
            pending: IndexMap::new(),
        })
    }

    pub fn index(&self) -> u8 {
        self.trustee.index
    }

    pub fn private_document(&self) -> &PrivateDocument {
        &self.private
    }

    /// The first submission of every trustee: its Feldman commitment
    pub fn start(&self) -> Submission {
        Submission::Commitment {
            trustee: self.trustee.index,
            commitment: self.trustee.keygen_commitment(&self.secret, &self.params),
        }
    }

    /// Carry out an instruction if it is addressed to this trustee
    pub fn execute<R: RngCore + CryptoRng>(
        &mut self,
        rng: &mut R,
        state: &ElectionState,
        instruction: &Instruction,
    ) -> Result<Vec<Submission>, Error> {
        let me = self.trustee.index;
        let submissions = match instruction {
            Instruction::ComputeShares { trustee } if *trustee == me => {
                vec![self.compute_shares(rng)?]
            }
            Instruction::VerifyShares { trustee, from } if *trustee == me => {
                vec![self.verify_shares(state, from)?]
            }
            Instruction::ComputeKeyshare { trustee } if *trustee == me => {
                match self.compute_keyshare() {
                    Ok(keyshare) => {
                        let lock = keyshare_test_lock(&self.params.election_id);
                        vec![Submission::KeyshareTest {
                            trustee: me,
                            partial: crate::partial_decrypt(rng, &lock, &keyshare),
                        }]
                    }
                    Err(Error::KeyshareAlreadyComputed(_)) => {
                        debug!("trustee {} keyshare already computed", me);
                        vec![]
                    }
                    Err(e) => return Err(e),
                }
            }
            Instruction::Shuffle { trustee, columns } if *trustee == me => {
                vec![self.shuffle(rng, state, columns)?]
            }
            Instruction::ProveShuffle { trustee, columns } if *trustee == me => {
                vec![self.prove_shuffles(rng, columns)?]
            }
            Instruction::PartialDecrypt { trustee, columns } if *trustee == me => {
                vec![self.partial_decrypt(rng, state, columns)?]
            }
            _ => vec![],
        };

        Ok(submissions)
    }

    fn compute_shares<R: RngCore + CryptoRng>(&mut self, rng: &mut R) -> Result<Submission, Error> {
        let (self_share, shares) = self
            .trustee
            .generate_shares(rng, &self.secret, &self.params)?;
        self.private
            .decrypted_shares_from
            .insert(self.trustee.index, self_share);

        debug!(
            "trustee {} encrypted {} pairwise shares",
            self.trustee.index,
            shares.len()
        );
        Ok(Submission::EncryptedShares {
            trustee: self.trustee.index,
            shares,
        })
    }

    fn verify_shares(&mut self, state: &ElectionState, from: &[u8]) -> Result<Submission, Error> {
        let me = self.trustee.index;
        let mut verified = IndexMap::with_capacity(from.len());

        for &sender in from.iter().filter(|s| **s != me) {
            let doc = state.trustee(sender)?;
            let encrypted = doc
                .encrypted_pairwise_shares_for
                .as_ref()
                .and_then(|shares| shares.get(&me));
            let (encrypted, commitment) = match (encrypted, doc.commitments.as_ref()) {
                (Some(encrypted), Some(commitment)) => (encrypted, commitment),
                _ => {
                    verified.insert(sender, ShareVerification::Pending);
                    continue;
                }
            };

            let passed = match self.trustee.decrypt_share(&self.secret, sender, encrypted) {
                Ok(share) if verify_share(&share, me, commitment) => {
                    self.private.decrypted_shares_from.insert(sender, share);
                    true
                }
                Ok(_) => false,
                Err(e) => {
                    warn!("trustee {}: {}", me, e);
                    false
                }
            };

            if !passed {
                warn!(
                    "trustee {}: share from trustee {} failed verification",
                    me, sender
                );
            }
            verified.insert(sender, ShareVerification::from_check(passed));
        }

        Ok(Submission::Verifications {
            trustee: me,
            verified,
        })
    }

    /// Sum the verified shares into this trustee's keyshare. Runs at most once.
    pub fn compute_keyshare(&mut self) -> Result<Scalar, Error> {
        let me = self.trustee.index;
        if self.private.private_keyshare.is_some() {
            return Err(Error::KeyshareAlreadyComputed(me));
        }

        let self_share = *self
            .private
            .decrypted_shares_from
            .get(&me)
            .ok_or(Error::KeyshareMissing(me))?;

        let received: IndexMap<u8, Scalar> = self
            .private
            .decrypted_shares_from
            .iter()
            .filter(|(from, _)| **from != me)
            .map(|(from, share)| (*from, *share))
            .collect();

        let needed = self.params.keyshare_quorum();
        if received.len() < needed {
            return Err(Error::OutOfOrder(format!(
                "trustee {} has {} verified shares, needs {}",
                me,
                received.len(),
                needed
            )));
        }

        let keyshare = compute_keyshare(&self_share, &received);
        self.private.private_keyshare = Some(keyshare);
        info!("trustee {} computed its keyshare", me);

        Ok(keyshare)
    }

    fn shuffle<R: RngCore + CryptoRng>(
        &mut self,
        rng: &mut R,
        state: &ElectionState,
        columns: &[String],
    ) -> Result<Submission, Error> {
        let me = self.trustee.index;
        let public_key = state
            .threshold_public_key
            .ok_or_else(|| Error::OutOfOrder("no public key".to_owned()))?;

        let mut shuffled = IndexMap::with_capacity(columns.len());
        for column in columns {
            let input = state.shuffle_input(me, column)?;

            // Check the predecessor's work independently before building on it
            if me > 1 {
                let predecessor = state.trustee(me - 1)?;
                let previous = predecessor.shuffled.get(column).ok_or_else(|| {
                    Error::OutOfOrder(format!("trustee {} has not shuffled", me - 1))
                })?;
                if let Some(proof) = previous.proof.as_ref() {
                    let previous_input = state.shuffle_input(me - 1, column)?;
                    let context = ShuffleContext::new(self.params.election_id, me - 1, column);
                    if !verify_shuffle(&public_key, &previous_input, &input, proof, &context) {
                        error!(
                            "trustee {}: shuffle from trustee {} for column '{}' failed to verify",
                            me,
                            me - 1,
                            column
                        );
                        return Err(Error::ShuffleProofInvalid {
                            trustee: me - 1,
                            column: column.clone(),
                        });
                    }
                }
            }

            let entry = if self.params.config.fast_shuffle {
                let (output, witness) = shuffle_deferred(rng, &public_key, &input)?;
                self.pending.insert(
                    column.clone(),
                    PendingShuffle {
                        public_key,
                        input,
                        output: output.clone(),
                        witness,
                    },
                );
                ShuffledColumn {
                    shuffled: output,
                    proof: None,
                }
            } else {
                let context = ShuffleContext::new(self.params.election_id, me, column);
                let (output, proof) = crate::mix::shuffle(rng, &public_key, &input, &context)?;
                ShuffledColumn {
                    shuffled: output,
                    proof: Some(proof),
                }
            };
            shuffled.insert(column.clone(), entry);
        }

        debug!("trustee {} shuffled {} columns", me, shuffled.len());
        Ok(Submission::Shuffled {
            trustee: me,
            columns: shuffled,
        })
    }

    fn prove_shuffles<R: RngCore + CryptoRng>(
        &mut self,
        rng: &mut R,
        columns: &[String],
    ) -> Result<Submission, Error> {
        let me = self.trustee.index;
        let mut proofs = IndexMap::with_capacity(columns.len());

        for column in columns {
            let pending = self.pending.get(column).ok_or_else(|| {
                Error::OutOfOrder(format!("no pending shuffle for column '{}'", column))
            })?;
            let context = ShuffleContext::new(self.params.election_id, me, column);
            let proof = prove(
                rng,
                &pending.public_key,
                &pending.input,
                &pending.output,
                &pending.witness,
                &context,
            )?;
            proofs.insert(column.clone(), proof);
        }

        // The witnesses are no longer needed once their proofs exist
        for column in columns {
            self.pending.remove(column);
        }

        Ok(Submission::ShuffleProofs { trustee: me, proofs })
    }

    fn partial_decrypt<R: RngCore + CryptoRng>(
        &mut self,
        rng: &mut R,
        state: &ElectionState,
        columns: &[String],
    ) -> Result<Submission, Error> {
        let me = self.trustee.index;
        let keyshare = self
            .private
            .private_keyshare
            .ok_or(Error::KeyshareMissing(me))?;

        let mut partials = IndexMap::with_capacity(columns.len());
        for column in columns {
            let shuffled = state.final_shuffle(column).ok_or_else(|| {
                Error::OutOfOrder(format!("column '{}' has not been shuffled", column))
            })?;
            let column_partials: Vec<PartialDecryption> = shuffled
                .shuffled
                .iter()
                .map(|c| crate::partial_decrypt(rng, &c.lock, &keyshare))
                .collect();
            partials.insert(column.clone(), column_partials);
        }

        debug!("trustee {} partially decrypted {} columns", me, partials.len());
        Ok(Submission::Partials {
            trustee: me,
            partials,
        })
    }
}
