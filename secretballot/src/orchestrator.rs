//! The protocol state machine.
//!
//! `transition` takes the current snapshot and one submitted fragment and returns the next
//! snapshot, the operations that fragment unblocked and a notification describing what changed.
//! It performs no I/O and never mutates its input, so the calling shell is free to persist,
//! retry or broadcast as it sees fit.

use crate::*;
use curve25519_dalek::ristretto::RistrettoPoint;
use indexmap::IndexMap;
use rayon::prelude::*;

/// A fragment of published data, submitted by a trustee, a voter or the election administrator
// Adjacently tagged so integer map keys survive deserialization
#[derive(Serialize, Deserialize, Debug, Clone)]
#[serde(tag = "type", content = "data", rename_all = "snake_case")]
pub enum Submission {
    Commitment {
        trustee: u8,
        commitment: Commitment,
    },
    EncryptedShares {
        trustee: u8,
        shares: IndexMap<u8, EncryptedShare>,
    },
    Verifications {
        trustee: u8,
        verified: IndexMap<u8, ShareVerification>,
    },
    KeyshareTest {
        trustee: u8,
        partial: PartialDecryption,
    },
    Vote {
        ballot: EncryptedBallot,
    },
    CloseVoting,
    Shuffled {
        trustee: u8,
        columns: IndexMap<String, ShuffledColumn>,
    },
    ShuffleProofs {
        trustee: u8,
        proofs: IndexMap<String, ShuffleProof>,
    },
    Partials {
        trustee: u8,
        partials: IndexMap<String, Vec<PartialDecryption>>,
    },
}

impl Submission {
    /// The participant behind this submission
    pub fn participant(&self) -> Participant {
        match self {
            Submission::Commitment { trustee, .. }
            | Submission::EncryptedShares { trustee, .. }
            | Submission::Verifications { trustee, .. }
            | Submission::KeyshareTest { trustee, .. }
            | Submission::Shuffled { trustee, .. }
            | Submission::ShuffleProofs { trustee, .. }
            | Submission::Partials { trustee, .. } => Participant::Trustee(*trustee),
            Submission::Vote { .. } => Participant::Voter,
            Submission::CloseVoting => Participant::Admin,
        }
    }
}

/// An operation that has become possible
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Instruction {
    /// All commitments are in; evaluate and encrypt pairwise shares
    ComputeShares { trustee: u8 },

    /// Shares addressed to `trustee` have arrived from `from`
    VerifyShares { trustee: u8, from: Vec<u8> },

    /// Enough shares have passed verification to compute the keyshare
    ComputeKeyshare { trustee: u8 },

    /// The election public key is known and voting may open
    PublishPublicKey {
        #[serde(with = "PointHex")]
        public_key: RistrettoPoint,
    },

    /// The predecessor's output (or the ballots) are ready to be shuffled
    Shuffle { trustee: u8, columns: Vec<String> },

    /// A fast shuffle still owes its proofs
    ProveShuffle { trustee: u8, columns: Vec<String> },

    /// The shuffle chain is complete and verified
    PartialDecrypt { trustee: u8, columns: Vec<String> },

    /// Every partial verified; the decrypted records and totals are in the state
    PublishResults,

    /// `trustee` cannot compute its keyshare until an operator resolves `reason`.
    /// The rest of the election carries on.
    Blocked { trustee: u8, reason: String },

    /// A proof failed. Nothing proceeds until a human has reviewed the data.
    Halt { reason: String },

    /// Nothing new is unblocked yet
    Wait { reason: String },
}

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum Participant {
    Trustee(u8),
    Voter,
    Admin,
}

/// Fire-and-forget broadcast describing which fields changed
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct Notification {
    pub election_id: uuid::Uuid,
    pub version: u64,
    pub participant: Participant,
    pub fields: Vec<String>,
}

/// Result of applying one submission
#[derive(Debug, Clone)]
pub struct Transition {
    pub state: ElectionState,
    pub instructions: Vec<Instruction>,
    pub notification: Notification,
}

/// Apply one submission to a snapshot
pub fn transition(
    params: &ElectionParameters,
    snapshot: &ElectionState,
    submission: Submission,
) -> Result<Transition, Error> {
    params.validate()?;
    if snapshot.election_id != params.election_id {
        return Err(Error::malformed("snapshot belongs to a different election"));
    }
    if snapshot.is_halted() {
        return Err(Error::OutOfOrder(
            "election is halted pending review of a failed proof".to_owned(),
        ));
    }

    let participant = submission.participant();
    if let Participant::Trustee(index) = participant {
        if params.get_trustee(index).is_none() {
            return Err(Error::TrusteeDoesNotExist(index));
        }
    }

    let mut state = snapshot.clone();
    let mut instructions = Vec::new();

    let fields = match submission {
        Submission::Commitment {
            trustee,
            commitment,
        } => on_commitment(params, &mut state, &mut instructions, trustee, commitment)?,
        Submission::EncryptedShares { trustee, shares } => {
            on_encrypted_shares(params, &mut state, &mut instructions, trustee, shares)?
        }
        Submission::Verifications { trustee, verified } => {
            on_verifications(params, &mut state, &mut instructions, trustee, verified)?
        }
        Submission::KeyshareTest { trustee, partial } => {
            on_keyshare_test(&mut state, &mut instructions, trustee, partial)?
        }
        Submission::Vote { ballot } => on_vote(&mut state, ballot)?,
        Submission::CloseVoting => on_close_voting(params, &mut state, &mut instructions)?,
        Submission::Shuffled { trustee, columns } => {
            on_shuffled(params, &mut state, &mut instructions, trustee, columns)?
        }
        Submission::ShuffleProofs { trustee, proofs } => {
            on_shuffle_proofs(params, &mut state, &mut instructions, trustee, proofs)?
        }
        Submission::Partials { trustee, partials } => {
            on_partials(params, &mut state, &mut instructions, trustee, partials)?
        }
    };

    if instructions.is_empty() {
        instructions.push(Instruction::Wait {
            reason: waiting_for(params, &state),
        });
    }

    state.version += 1;
    let notification = Notification {
        election_id: state.election_id,
        version: state.version,
        participant,
        fields,
    };

    Ok(Transition {
        state,
        instructions,
        notification,
    })
}

fn fields(names: &[&str]) -> Vec<String> {
    names.iter().map(|n| n.to_string()).collect()
}

// Record a failed proof and stop the election
fn refuse(
    state: &mut ElectionState,
    instructions: &mut Vec<Instruction>,
    participant: u8,
    error: Error,
) {
    error!("election {}: {}", state.election_id, error);
    let reason = error.to_string();
    state.refusals.push(Refusal {
        participant,
        error: reason.clone(),
    });
    instructions.clear();
    instructions.push(Instruction::Halt { reason });
}

fn on_commitment(
    params: &ElectionParameters,
    state: &mut ElectionState,
    instructions: &mut Vec<Instruction>,
    trustee: u8,
    commitment: Commitment,
) -> Result<Vec<String>, Error> {
    if commitment.len() != params.threshold as usize {
        return Err(Error::malformed(format!(
            "commitment from trustee {} has {} terms, expected {}",
            trustee,
            commitment.len(),
            params.threshold
        )));
    }

    let doc = state.trustee_mut(trustee)?;
    if doc.commitments.is_some() {
        return Err(Error::OutOfOrder(format!(
            "trustee {} has already published commitments",
            trustee
        )));
    }
    doc.commitments = Some(commitment);
    debug!("trustee {} published commitments", trustee);

    let mut changed = fields(&["commitments"]);

    if let Some(commitments) = state.all_commitments() {
        let public_key = threshold_public_key(commitments);
        state.threshold_public_key = Some(public_key);
        info!(
            "election {}: all commitments published, public key {}",
            state.election_id,
            point_to_hex(&public_key)
        );

        instructions.push(Instruction::PublishPublicKey { public_key });
        for index in params.indexes() {
            instructions.push(Instruction::ComputeShares { trustee: index });
        }
        changed.push("threshold_public_key".to_owned());
    }

    Ok(changed)
}

fn on_encrypted_shares(
    params: &ElectionParameters,
    state: &mut ElectionState,
    instructions: &mut Vec<Instruction>,
    trustee: u8,
    shares: IndexMap<u8, EncryptedShare>,
) -> Result<Vec<String>, Error> {
    if state.all_commitments().is_none() {
        return Err(Error::OutOfOrder(
            "pairwise shares submitted before all commitments".to_owned(),
        ));
    }

    let expected: Vec<u8> = params.indexes().filter(|i| *i != trustee).collect();
    if shares.len() != expected.len() || !expected.iter().all(|i| shares.contains_key(i)) {
        return Err(Error::malformed(format!(
            "trustee {} must send exactly one share to each of {:?}",
            trustee, expected
        )));
    }

    let doc = state.trustee_mut(trustee)?;
    if doc.encrypted_pairwise_shares_for.is_some() {
        return Err(Error::OutOfOrder(format!(
            "trustee {} has already published pairwise shares",
            trustee
        )));
    }
    doc.encrypted_pairwise_shares_for = Some(shares);
    debug!("trustee {} published encrypted pairwise shares", trustee);

    // The sender may already have verified enough shares from the others
    let needed = params.keyshare_quorum();
    let ready = doc.passed_count() >= needed && !doc.has_failed_verification();

    for recipient in expected {
        instructions.push(Instruction::VerifyShares {
            trustee: recipient,
            from: vec![trustee],
        });
    }

    if ready {
        instructions.push(Instruction::ComputeKeyshare { trustee });
    }

    Ok(fields(&["encrypted_pairwise_shares_for"]))
}

fn on_verifications(
    params: &ElectionParameters,
    state: &mut ElectionState,
    instructions: &mut Vec<Instruction>,
    trustee: u8,
    verified: IndexMap<u8, ShareVerification>,
) -> Result<Vec<String>, Error> {
    for (from, _) in verified.iter() {
        if *from == trustee || params.get_trustee(*from).is_none() {
            return Err(Error::malformed(format!(
                "trustee {} cannot record a verification for {}",
                trustee, from
            )));
        }
        let published = state
            .trustee(*from)?
            .encrypted_pairwise_shares_for
            .is_some();
        if !published {
            return Err(Error::OutOfOrder(format!(
                "trustee {} has not published shares yet",
                from
            )));
        }
    }

    let needed = params.keyshare_quorum();
    let doc = state.trustee_mut(trustee)?;

    for (from, verification) in verified.into_iter() {
        if verification == ShareVerification::Pending {
            continue;
        }
        if verification == ShareVerification::Failed {
            warn!(
                "trustee {} reports the share from trustee {} failed verification",
                trustee, from
            );
        }
        doc.verified.insert(from, verification);
    }

    if doc.has_failed_verification() {
        for error in failed_verifications(doc) {
            instructions.push(Instruction::Blocked {
                trustee,
                reason: error.to_string(),
            });
        }
        return Ok(fields(&["verified"]));
    }

    // The self-share only exists once the trustee has published its own shares.
    // Repeats are harmless, a keyshare is only ever computed once.
    if doc.encrypted_pairwise_shares_for.is_some()
        && doc.passed_count() >= needed
        && doc.keyshare_test.is_none()
    {
        instructions.push(Instruction::ComputeKeyshare { trustee });
    }

    Ok(fields(&["verified"]))
}

// One error per share the trustee reported as failing verification
fn failed_verifications(doc: &TrusteeDocument) -> Vec<Error> {
    doc.verified
        .iter()
        .filter(|(_, v)| **v == ShareVerification::Failed)
        .map(|(from, _)| Error::ShareVerificationFailed {
            trustee: doc.index,
            from: *from,
        })
        .collect()
}

fn on_keyshare_test(
    state: &mut ElectionState,
    instructions: &mut Vec<Instruction>,
    trustee: u8,
    partial: PartialDecryption,
) -> Result<Vec<String>, Error> {
    let public_keyshares = state.public_keyshares().ok_or_else(|| {
        Error::OutOfOrder("keyshare test submitted before all commitments".to_owned())
    })?;
    if state.trustee(trustee)?.keyshare_test.is_some() {
        return Err(Error::OutOfOrder(format!(
            "trustee {} has already published a keyshare test",
            trustee
        )));
    }

    let lock = keyshare_test_lock(&state.election_id);
    let valid = verify_partial(&lock, &public_keyshares[&trustee], &partial);

    state.trustee_mut(trustee)?.keyshare_test = Some(partial);

    if !valid {
        refuse(
            state,
            instructions,
            trustee,
            Error::PartialProofInvalid {
                trustee,
                column: "keyshare_test".to_owned(),
                row: 0,
            },
        );
        return Ok(fields(&["keyshare_test", "refusals"]));
    }

    info!("trustee {} passed the keyshare test", trustee);
    Ok(fields(&["keyshare_test"]))
}

fn on_vote(state: &mut ElectionState, ballot: EncryptedBallot) -> Result<Vec<String>, Error> {
    if state.threshold_public_key.is_none() {
        return Err(Error::OutOfOrder(
            "votes cannot be accepted before the public key exists".to_owned(),
        ));
    }
    if state.voting_closed {
        return Err(Error::OutOfOrder("voting is closed".to_owned()));
    }
    if ballot.is_empty() {
        return Err(Error::malformed("ballot has no items"));
    }

    if let Some(first) = state.votes.first() {
        if first.len() != ballot.len() || !first.keys().all(|k| ballot.contains_key(k)) {
            return Err(Error::malformed(
                "ballot items do not match previously accepted ballots",
            ));
        }
    }

    state.votes.push(ballot);

    Ok(fields(&["votes"]))
}

fn on_close_voting(
    params: &ElectionParameters,
    state: &mut ElectionState,
    instructions: &mut Vec<Instruction>,
) -> Result<Vec<String>, Error> {
    if state.voting_closed {
        return Err(Error::OutOfOrder("voting is already closed".to_owned()));
    }
    if state.votes.is_empty() {
        return Err(Error::OutOfOrder("no votes to tally".to_owned()));
    }

    state.voting_closed = true;
    info!(
        "election {}: voting closed with {} ballots",
        state.election_id,
        state.votes.len()
    );

    if let Some(first) = params.indexes().next() {
        instructions.push(Instruction::Shuffle {
            trustee: first,
            columns: state.columns(),
        });
    }

    Ok(fields(&["voting_closed"]))
}

// Verify one trustee's shuffle proofs for the given columns, returning the first failing column
fn failed_shuffle_column(
    params: &ElectionParameters,
    state: &ElectionState,
    trustee: u8,
    columns: &IndexMap<String, ShuffledColumn>,
) -> Result<Option<String>, Error> {
    let public_key = state
        .threshold_public_key
        .ok_or_else(|| Error::OutOfOrder("no public key".to_owned()))?;

    let mut checks = Vec::with_capacity(columns.len());
    for (column, shuffled) in columns.iter() {
        let proof = match shuffled.proof.as_ref() {
            Some(proof) => proof,
            None => continue,
        };
        let input = state.shuffle_input(trustee, column)?;
        checks.push((column, input, shuffled, proof));
    }

    let check = |(column, input, shuffled, proof): &(
        &String,
        Vec<Ciphertext>,
        &ShuffledColumn,
        &ShuffleProof,
    )| {
        let context = ShuffleContext::new(params.election_id, trustee, column);
        if verify_shuffle(&public_key, input, &shuffled.shuffled, proof, &context) {
            None
        } else {
            Some((*column).clone())
        }
    };

    let failed = if params.config.parallel_verify {
        checks.par_iter().filter_map(check).min()
    } else {
        checks.iter().filter_map(check).next()
    };

    Ok(failed)
}

fn on_shuffled(
    params: &ElectionParameters,
    state: &mut ElectionState,
    instructions: &mut Vec<Instruction>,
    trustee: u8,
    columns: IndexMap<String, ShuffledColumn>,
) -> Result<Vec<String>, Error> {
    if !state.voting_closed {
        return Err(Error::OutOfOrder("voting is still open".to_owned()));
    }

    let expected = state.columns();
    if columns.len() != expected.len() || !expected.iter().all(|c| columns.contains_key(c)) {
        return Err(Error::malformed(format!(
            "trustee {} must shuffle exactly the columns {:?}",
            trustee, expected
        )));
    }

    if state.trustee(trustee)?.has_shuffled(&expected) {
        return Err(Error::OutOfOrder(format!(
            "trustee {} has already shuffled",
            trustee
        )));
    }

    if trustee > 1 {
        let predecessor = state.trustee(trustee - 1)?;
        let ready = if params.config.fast_shuffle {
            predecessor.has_shuffled(&expected)
        } else {
            predecessor.shuffle_proven(&expected)
        };
        if !ready {
            return Err(Error::OutOfOrder(format!(
                "trustee {} shuffled before trustee {}",
                trustee,
                trustee - 1
            )));
        }
    }

    for (column, shuffled) in columns.iter() {
        let input = state.shuffle_input(trustee, column)?;
        if input.len() != shuffled.shuffled.len() {
            return Err(Error::MismatchedLength(input.len(), shuffled.shuffled.len()));
        }
        if shuffled.proof.is_none() && !params.config.fast_shuffle {
            return Err(Error::malformed(format!(
                "shuffle of column '{}' is missing its proof",
                column
            )));
        }
    }

    if let Some(column) = failed_shuffle_column(params, state, trustee, &columns)? {
        state.trustee_mut(trustee)?.shuffled = columns;
        refuse(
            state,
            instructions,
            trustee,
            Error::ShuffleProofInvalid { trustee, column },
        );
        return Ok(fields(&["shuffled", "refusals"]));
    }

    let unproven: Vec<String> = columns
        .iter()
        .filter(|(_, s)| s.proof.is_none())
        .map(|(c, _)| c.clone())
        .collect();

    state.trustee_mut(trustee)?.shuffled = columns;
    info!("trustee {} shuffled {} columns", trustee, expected.len());

    if !unproven.is_empty() {
        instructions.push(Instruction::ProveShuffle {
            trustee,
            columns: unproven,
        });
    }

    if trustee < params.last_index() {
        instructions.push(Instruction::Shuffle {
            trustee: trustee + 1,
            columns: expected,
        });
    } else {
        start_decryption(params, state, instructions);
    }

    Ok(fields(&["shuffled"]))
}

fn on_shuffle_proofs(
    params: &ElectionParameters,
    state: &mut ElectionState,
    instructions: &mut Vec<Instruction>,
    trustee: u8,
    proofs: IndexMap<String, ShuffleProof>,
) -> Result<Vec<String>, Error> {
    let mut proven: IndexMap<String, ShuffledColumn> = IndexMap::with_capacity(proofs.len());
    {
        let doc = state.trustee(trustee)?;
        for (column, proof) in proofs.into_iter() {
            let shuffled = doc.shuffled.get(&column).ok_or_else(|| {
                Error::OutOfOrder(format!(
                    "proof for column '{}' submitted before its shuffle",
                    column
                ))
            })?;
            if shuffled.proof.is_some() {
                return Err(Error::OutOfOrder(format!(
                    "column '{}' already has a proof",
                    column
                )));
            }
            proven.insert(
                column,
                ShuffledColumn {
                    shuffled: shuffled.shuffled.clone(),
                    proof: Some(proof),
                },
            );
        }
    }

    let failed = failed_shuffle_column(params, state, trustee, &proven)?;
    let doc = state.trustee_mut(trustee)?;
    for (column, shuffled) in proven.into_iter() {
        doc.shuffled.insert(column, shuffled);
    }

    if let Some(column) = failed {
        refuse(
            state,
            instructions,
            trustee,
            Error::ShuffleProofInvalid { trustee, column },
        );
        return Ok(fields(&["shuffled", "refusals"]));
    }

    debug!("trustee {} published deferred shuffle proofs", trustee);
    start_decryption(params, state, instructions);

    Ok(fields(&["shuffled"]))
}

// Once every shuffle is in and proven, every trustee can partially decrypt
fn start_decryption(
    params: &ElectionParameters,
    state: &ElectionState,
    instructions: &mut Vec<Instruction>,
) {
    if !state.shuffle_chain_complete() {
        return;
    }

    info!(
        "election {}: shuffle chain complete, requesting partial decryptions",
        state.election_id
    );
    let columns = state.columns();
    for index in params.indexes() {
        instructions.push(Instruction::PartialDecrypt {
            trustee: index,
            columns: columns.clone(),
        });
    }
}

fn on_partials(
    params: &ElectionParameters,
    state: &mut ElectionState,
    instructions: &mut Vec<Instruction>,
    trustee: u8,
    partials: IndexMap<String, Vec<PartialDecryption>>,
) -> Result<Vec<String>, Error> {
    if !state.shuffle_chain_complete() {
        return Err(Error::OutOfOrder(
            "partials submitted before the shuffle chain completed".to_owned(),
        ));
    }
    if !state.trustee(trustee)?.partials.is_empty() {
        return Err(Error::OutOfOrder(format!(
            "trustee {} has already published partials",
            trustee
        )));
    }

    let columns = state.columns();
    if partials.len() != columns.len() || !columns.iter().all(|c| partials.contains_key(c)) {
        return Err(Error::malformed(format!(
            "trustee {} must partially decrypt exactly the columns {:?}",
            trustee, columns
        )));
    }

    let public_keyshares = state
        .public_keyshares()
        .ok_or_else(|| Error::OutOfOrder("commitments missing".to_owned()))?;
    let public_keyshare = public_keyshares[&trustee];

    // Verify every partial before it counts towards the barrier
    let mut failed: Option<(String, usize)> = None;
    for (column, column_partials) in partials.iter() {
        let shuffled = state
            .final_shuffle(column)
            .map(|s| &s.shuffled)
            .ok_or_else(|| Error::OutOfOrder(format!("column '{}' not shuffled", column)))?;
        if shuffled.len() != column_partials.len() {
            return Err(Error::MismatchedLength(shuffled.len(), column_partials.len()));
        }

        let check = |(row, (ciphertext, partial)): (usize, (&Ciphertext, &PartialDecryption))| {
            if verify_partial(&ciphertext.lock, &public_keyshare, partial) {
                None
            } else {
                Some(row)
            }
        };
        let rows = shuffled.iter().zip(column_partials.iter());
        let bad_row = if params.config.parallel_verify {
            rows.collect::<Vec<_>>()
                .into_par_iter()
                .enumerate()
                .filter_map(check)
                .min()
        } else {
            rows.enumerate().filter_map(check).next()
        };

        if let Some(row) = bad_row {
            failed = Some((column.clone(), row));
            break;
        }
    }

    state.trustee_mut(trustee)?.partials = partials;

    if let Some((column, row)) = failed {
        refuse(
            state,
            instructions,
            trustee,
            Error::PartialProofInvalid {
                trustee,
                column,
                row,
            },
        );
        return Ok(fields(&["partials", "refusals"]));
    }

    let complete = state.trustees.values().all(|t| !t.partials.is_empty());
    if !complete {
        return Ok(fields(&["partials"]));
    }

    // Every partial was verified on arrival
    let mut decrypted: IndexMap<String, Vec<String>> = IndexMap::with_capacity(columns.len());
    for column in columns.iter() {
        let ciphertexts = state
            .final_shuffle(column)
            .map(|s| s.shuffled.clone())
            .unwrap_or_default();
        let column_partials: IndexMap<u8, Vec<PartialDecryption>> = state
            .trustees
            .iter()
            .filter_map(|(i, t)| t.partials.get(column).map(|p| (*i, p.clone())))
            .collect();

        let values = combine_column(column, &ciphertexts, &column_partials, &public_keyshares)?;
        decrypted.insert(column.clone(), values);
    }

    let Recombined { records, invalid } = recombine_decrypteds(&decrypted);
    let totals = tally_records(&records, &columns);
    info!(
        "election {}: decrypted {} ballots",
        state.election_id,
        records.len()
    );
    if !invalid.is_empty() {
        warn!(
            "election {}: {} decrypted items were not counted",
            state.election_id,
            invalid.len()
        );
    }

    state.decrypted = Some(records);
    state.totals = Some(totals);
    state.invalid = invalid;
    instructions.push(Instruction::PublishResults);

    Ok(fields(&["partials", "decrypted", "totals", "invalid"]))
}

// Human readable description of what the election is blocked on
fn waiting_for(params: &ElectionParameters, state: &ElectionState) -> String {
    let missing = |pred: &dyn Fn(&TrusteeDocument) -> bool| -> Vec<u8> {
        state
            .trustees
            .values()
            .filter(|t| !pred(t))
            .map(|t| t.index)
            .collect()
    };

    if state.threshold_public_key.is_none() {
        return format!(
            "commitments from trustees {:?}",
            missing(&|t| t.commitments.is_some())
        );
    }

    let shares = missing(&|t| t.encrypted_pairwise_shares_for.is_some());
    if !shares.is_empty() {
        return format!("pairwise shares from trustees {:?}", shares);
    }

    let failures: Vec<String> = state
        .trustees
        .values()
        .flat_map(failed_verifications)
        .map(|e| e.to_string())
        .collect();
    if !failures.is_empty() {
        return format!("operator review of {}", failures.join("; "));
    }

    let needed = params.keyshare_quorum();
    let verifying = missing(&|t| t.passed_count() >= needed);
    if !verifying.is_empty() {
        return format!("share verifications from trustees {:?}", verifying);
    }

    if !state.voting_closed {
        return format!("votes ({} so far) and the close of voting", state.votes.len());
    }

    let columns = state.columns();
    let shuffles = missing(&|t| t.shuffle_proven(&columns));
    if !shuffles.is_empty() {
        return format!("proven shuffles from trustees {:?}", shuffles);
    }

    let partials = missing(&|t| !t.partials.is_empty());
    if !partials.is_empty() {
        return format!("partial decryptions from trustees {:?}", partials);
    }

    "nothing".to_owned()
}
