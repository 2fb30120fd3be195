use super::*;
use curve25519_dalek::scalar::Scalar;
use indexmap::IndexMap;
use rand::SeedableRng;
use rand_chacha::ChaCha20Rng;
use std::collections::VecDeque;
use uuid::Uuid;

#[test]
fn end_to_end_two_trustees() {
    let mut rng = ChaCha20Rng::from_seed([100u8; 32]);
    let election_id = Uuid::new_v4();

    // Create the trustees
    let (trustee_1, secret_1) = Trustee::new(&mut rng, 1).unwrap();
    let (trustee_2, secret_2) = Trustee::new(&mut rng, 2).unwrap();
    let params = ElectionParameters::new(
        election_id,
        vec![trustee_1.clone(), trustee_2.clone()],
        2,
    )
    .unwrap();

    // Commitments of degree 1
    let commitment_1 = trustee_1.keygen_commitment(&secret_1, &params);
    let commitment_2 = trustee_2.keygen_commitment(&secret_2, &params);
    assert_eq!(commitment_1.len(), 2);
    let commitments = vec![commitment_1.clone(), commitment_2.clone()];

    // Exchange pairwise shares
    let (self_share_1, shares_1) = trustee_1
        .generate_shares(&mut rng, &secret_1, &params)
        .unwrap();
    let (self_share_2, shares_2) = trustee_2
        .generate_shares(&mut rng, &secret_2, &params)
        .unwrap();

    let from_2 = trustee_1.decrypt_share(&secret_1, 2, &shares_2[&1]).unwrap();
    let from_1 = trustee_2.decrypt_share(&secret_2, 1, &shares_1[&2]).unwrap();
    assert!(verify_share(&from_2, 1, &commitment_2));
    assert!(verify_share(&from_1, 2, &commitment_1));

    let mut received_1 = IndexMap::new();
    received_1.insert(2, from_2);
    let mut received_2 = IndexMap::new();
    received_2.insert(1, from_1);
    let keyshare_1 = compute_keyshare(&self_share_1, &received_1);
    let keyshare_2 = compute_keyshare(&self_share_2, &received_2);

    let public_key = threshold_public_key(commitments.iter());
    assert_eq!(base_mul(&keyshare_1), public_keyshare(1, commitments.iter()));
    assert_eq!(base_mul(&keyshare_2), public_keyshare(2, commitments.iter()));

    // Encrypt two ballots
    let mut first = IndexMap::new();
    first.insert("president".to_owned(), "CandidateA".to_owned());
    first.insert("mayor".to_owned(), "CandidateC".to_owned());
    let mut second = IndexMap::new();
    second.insert("president".to_owned(), "CandidateB".to_owned());
    second.insert("mayor".to_owned(), BLANK.to_owned());

    let ballots = vec![
        encrypt_ballot(&mut rng, &public_key, "0001", &first, &params.config).unwrap(),
        encrypt_ballot(&mut rng, &public_key, "0002", &second, &params.config).unwrap(),
    ];
    let columns = split_into_columns(&ballots).unwrap();

    // Two step shuffle chain, each verified before the next begins
    let mut shuffled: IndexMap<String, Vec<Ciphertext>> = IndexMap::new();
    for (column, input) in columns.iter() {
        let context_1 = ShuffleContext::new(election_id, 1, column);
        let (output_1, proof_1) = shuffle(&mut rng, &public_key, input, &context_1).unwrap();
        assert!(verify_shuffle(&public_key, input, &output_1, &proof_1, &context_1));

        let context_2 = ShuffleContext::new(election_id, 2, column);
        let (output_2, proof_2) = shuffle(&mut rng, &public_key, &output_1, &context_2).unwrap();
        assert!(verify_shuffle(&public_key, &output_1, &output_2, &proof_2, &context_2));

        // A proof is bound to its trustee
        assert!(!verify_shuffle(&public_key, &output_1, &output_2, &proof_2, &context_1));

        shuffled.insert(column.clone(), output_2);
    }

    // Both trustees partially decrypt, then combine
    let mut public_keyshares = IndexMap::new();
    public_keyshares.insert(1, public_keyshare(1, commitments.iter()));
    public_keyshares.insert(2, public_keyshare(2, commitments.iter()));

    let mut decrypted = IndexMap::new();
    for (column, ciphertexts) in shuffled.iter() {
        let mut partials = IndexMap::new();
        for (index, keyshare) in [(1u8, &keyshare_1), (2u8, &keyshare_2)].iter() {
            let column_partials: Vec<PartialDecryption> = ciphertexts
                .iter()
                .map(|c| partial_decrypt(&mut rng, &c.lock, keyshare))
                .collect();
            partials.insert(*index, column_partials);
        }

        // Missing a trustee is never enough
        let mut partial_set = partials.clone();
        partial_set.remove(&2);
        match decrypt_column(column, ciphertexts, &partial_set, &public_keyshares, false) {
            Err(Error::NotEnoughPartials(2, 1)) => {}
            other => panic!("expected missing partials, got {:?}", other),
        }

        let values = decrypt_column(column, ciphertexts, &partials, &public_keyshares, true).unwrap();
        decrypted.insert(column.clone(), values);
    }

    assert!(decrypted["president"].contains(&"0001:CandidateA".to_owned()));

    let Recombined { records, invalid } = recombine_decrypteds(&decrypted);
    assert!(invalid.is_empty());
    assert_eq!(records.len(), 2);
    let record = records.iter().find(|r| r.tracking == "0001").unwrap();
    assert_eq!(record.selections["president"], "CandidateA");
    assert_eq!(record.selections["mayor"], "CandidateC");
    let record = records.iter().find(|r| r.tracking == "0002").unwrap();
    assert_eq!(record.selections.len(), 1);

    let totals = tally_records(&records, &["president".to_owned(), "mayor".to_owned()]);
    assert_eq!(totals["president"].num_votes, 2);
    assert_eq!(totals["mayor"].num_votes, 1);
}

struct Harness {
    rng: ChaCha20Rng,
    params: ElectionParameters,
    agents: Vec<TrusteeAgent>,
    store: MemStore,
    queue: VecDeque<Submission>,
    halted: Option<String>,
    blocked: Vec<(u8, String)>,
    published: bool,
}

impl Harness {
    fn new(seed: u8, n: u8, threshold: u8, fast_shuffle: bool) -> Self {
        let mut rng = ChaCha20Rng::from_seed([seed; 32]);
        let mut trustees = Vec::new();
        let mut secrets = Vec::new();
        for i in 1..=n {
            let (trustee, secret) = Trustee::new(&mut rng, i).unwrap();
            trustees.push(trustee);
            secrets.push(secret);
        }

        let mut params = ElectionParameters::new(Uuid::new_v4(), trustees, threshold).unwrap();
        params.config.fast_shuffle = fast_shuffle;

        let agents = params
            .trustees
            .clone()
            .into_iter()
            .zip(secrets.into_iter())
            .map(|(trustee, secret)| TrusteeAgent::new(trustee, secret, params.clone()).unwrap())
            .collect();

        let mut store = MemStore::default();
        store.put_state(&ElectionState::new(&params)).unwrap();

        Harness {
            rng,
            params,
            agents,
            store,
            queue: VecDeque::new(),
            halted: None,
            blocked: Vec::new(),
            published: false,
        }
    }

    fn state(&self) -> ElectionState {
        self.store.get_state(self.params.election_id).unwrap().unwrap()
    }

    // Apply one submission and hand every resulting instruction to the agents
    fn apply(&mut self, submission: Submission) -> Result<(), Error> {
        let snapshot = self.state();
        let step = transition(&self.params, &snapshot, submission)?;
        self.store.put_state(&step.state)?;

        for instruction in step.instructions.iter() {
            match instruction {
                Instruction::Halt { reason } => self.halted = Some(reason.clone()),
                Instruction::Blocked { trustee, reason } => {
                    self.blocked.push((*trustee, reason.clone()))
                }
                Instruction::PublishResults => self.published = true,
                _ => {}
            }
            for agent in self.agents.iter_mut() {
                let submissions = agent.execute(&mut self.rng, &step.state, instruction)?;
                self.queue.extend(submissions);
            }
        }
        Ok(())
    }

    fn run(&mut self) {
        while let Some(submission) = self.queue.pop_front() {
            self.apply(submission).unwrap();
        }
    }

    fn run_key_generation(&mut self) {
        let commitments: Vec<Submission> = self.agents.iter().map(|a| a.start()).collect();
        self.queue.extend(commitments);
        self.run();
    }

    fn vote(&mut self, tracking: &str, selections: &[(&str, &str)]) {
        let public_key = self.state().threshold_public_key.unwrap();
        let selections: IndexMap<String, String> = selections
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        let ballot = encrypt_ballot(
            &mut self.rng,
            &public_key,
            tracking,
            &selections,
            &self.params.config,
        )
        .unwrap();
        self.apply(Submission::Vote { ballot }).unwrap();
    }
}

fn cast_votes(harness: &mut Harness) {
    harness.vote("10000001", &[("president", "Alice"), ("measure", "yes")]);
    harness.vote("10000002", &[("president", "Bob"), ("measure", "no")]);
    harness.vote("10000003", &[("president", "Alice"), ("measure", BLANK)]);
}

fn check_results(state: &ElectionState) {
    let records = state.decrypted.as_ref().unwrap();
    assert_eq!(records.len(), 3);
    let record = records.iter().find(|r| r.tracking == "10000002").unwrap();
    assert_eq!(record.selections["president"], "Bob");
    assert_eq!(record.selections["measure"], "no");

    let totals = state.totals.as_ref().unwrap();
    let president = &totals["president"];
    assert_eq!(president.num_votes, 3);
    assert_eq!(president.totals[0].selection, "Alice");
    assert_eq!(president.totals[0].count, 2);
    assert_eq!(totals["measure"].num_votes, 2);
}

#[test]
fn orchestrated_election() {
    let mut harness = Harness::new(101, 3, 3, false);
    harness.run_key_generation();

    let state = harness.state();
    assert!(state.threshold_public_key.is_some());
    for trustee in state.trustees.values() {
        assert_eq!(trustee.passed_count(), 2);
        assert!(trustee.keyshare_test.is_some());
    }
    for agent in harness.agents.iter() {
        assert!(agent.private_document().private_keyshare.is_some());
    }

    cast_votes(&mut harness);
    harness.apply(Submission::CloseVoting).unwrap();
    harness.run();

    assert!(harness.halted.is_none());
    assert!(harness.published);

    let state = harness.state();
    assert!(state.shuffle_chain_complete());
    check_results(&state);

    // Nothing further is accepted for a finished election's partials
    let partials = state.trustee(1).unwrap().partials.clone();
    assert!(transition(
        &harness.params,
        &state,
        Submission::Partials {
            trustee: 1,
            partials
        }
    )
    .is_err());
}

#[test]
fn fast_shuffle_election() {
    // Threshold below the trustee count still needs every trustee
    let mut harness = Harness::new(102, 3, 2, true);
    harness.run_key_generation();
    cast_votes(&mut harness);
    harness.apply(Submission::CloseVoting).unwrap();
    harness.run();

    assert!(harness.halted.is_none());
    assert!(harness.published);
    check_results(&harness.state());
}

#[test]
fn undecodable_ballot_is_set_aside() {
    let mut harness = Harness::new(107, 2, 2, false);
    harness.run_key_generation();
    cast_votes(&mut harness);

    // Well formed ciphertexts that decrypt to nothing countable
    let public_key = harness.state().threshold_public_key.unwrap();
    let mut ballot = EncryptedBallot::new();
    ballot.insert(
        "president".to_owned(),
        Ciphertext::encrypt_str(&mut harness.rng, &public_key, "garbage").unwrap(),
    );
    ballot.insert(
        "measure".to_owned(),
        Ciphertext::encrypt_random(&mut harness.rng, &public_key, &generator()),
    );
    harness.apply(Submission::Vote { ballot }).unwrap();

    harness.apply(Submission::CloseVoting).unwrap();
    harness.run();

    assert!(harness.halted.is_none());
    assert!(harness.published);

    let state = harness.state();
    check_results(&state);
    assert_eq!(state.invalid.len(), 2);
    assert!(state
        .invalid
        .iter()
        .any(|i| i.column == "president" && i.value == "garbage"));
    assert!(state
        .invalid
        .iter()
        .all(|i| i.reason == "no tracking number"));
}

#[test]
fn colliding_tracking_numbers_are_reported() {
    let mut harness = Harness::new(108, 2, 2, false);
    harness.run_key_generation();
    cast_votes(&mut harness);
    harness.vote("10000004", &[("president", "Alice"), ("measure", "yes")]);
    harness.vote("10000004", &[("president", "Bob"), ("measure", "no")]);
    harness.apply(Submission::CloseVoting).unwrap();
    harness.run();

    assert!(harness.published);
    let state = harness.state();
    assert_eq!(state.decrypted.as_ref().unwrap().len(), 4);

    // One item per column is kept, the other is reported rather than overwritten
    assert_eq!(state.invalid.len(), 2);
    for item in state.invalid.iter() {
        assert_eq!(item.reason, "duplicate tracking number 10000004");
    }
    let totals = state.totals.as_ref().unwrap();
    assert_eq!(totals["president"].num_votes, 4);
    assert_eq!(totals["measure"].num_votes, 3);
}

#[test]
fn failed_share_blocks_only_its_recipient() {
    let mut harness = Harness::new(109, 3, 3, false);
    let commitments: Vec<Submission> = harness.agents.iter().map(|a| a.start()).collect();
    harness.queue.extend(commitments);

    // Trustee 1 reports the share from trustee 2 as bad
    while let Some(submission) = harness.queue.pop_front() {
        let submission = match submission {
            Submission::Verifications {
                trustee: 1,
                mut verified,
            } => {
                if let Some(verification) = verified.get_mut(&2) {
                    *verification = ShareVerification::Failed;
                }
                Submission::Verifications {
                    trustee: 1,
                    verified,
                }
            }
            other => other,
        };
        harness.apply(submission).unwrap();
    }

    let state = harness.state();
    assert_eq!(
        state.trustee(1).unwrap().verified[&2],
        ShareVerification::Failed
    );
    assert!(state.trustee(1).unwrap().keyshare_test.is_none());
    assert!(harness.agents[0]
        .private_document()
        .private_keyshare
        .is_none());
    assert!(state.trustee(2).unwrap().keyshare_test.is_some());
    assert!(state.trustee(3).unwrap().keyshare_test.is_some());

    assert!(!harness.blocked.is_empty());
    for (trustee, reason) in harness.blocked.iter() {
        assert_eq!(*trustee, 1);
        assert!(reason.contains("from trustee 2 to trustee 1"));
    }

    // The failure is what the election reports waiting on
    let public_key = state.threshold_public_key.unwrap();
    let mut selections = IndexMap::new();
    selections.insert("president".to_owned(), "Alice".to_owned());
    let ballot = encrypt_ballot(
        &mut harness.rng,
        &public_key,
        "10000001",
        &selections,
        &harness.params.config,
    )
    .unwrap();
    let step = transition(&harness.params, &state, Submission::Vote { ballot }).unwrap();
    match &step.instructions[..] {
        [Instruction::Wait { reason }] => assert!(reason.contains("operator review")),
        other => panic!("unexpected instructions {:?}", other),
    }
}

#[test]
fn tampered_partial_halts_election() {
    let mut harness = Harness::new(103, 2, 2, false);
    harness.run_key_generation();
    cast_votes(&mut harness);
    harness.apply(Submission::CloseVoting).unwrap();

    // Run until the first partials are ready, then corrupt them
    while let Some(submission) = harness.queue.pop_front() {
        if let Submission::Partials {
            trustee,
            mut partials,
        } = submission
        {
            let first = partials.values_mut().next().unwrap();
            first[0].proof.response += Scalar::one();
            harness
                .apply(Submission::Partials { trustee, partials })
                .unwrap();
            break;
        }
        harness.apply(submission).unwrap();
    }

    let state = harness.state();
    assert!(state.is_halted());
    assert!(harness.halted.is_some());
    assert!(!harness.published);
    assert!(state.decrypted.is_none());

    // Everything afterwards is refused until reviewed
    while let Some(submission) = harness.queue.pop_front() {
        assert!(harness.apply(submission).is_err());
    }
}

#[test]
fn tampered_shuffle_halts_election() {
    let mut harness = Harness::new(104, 2, 2, false);
    harness.run_key_generation();
    cast_votes(&mut harness);
    harness.apply(Submission::CloseVoting).unwrap();

    let submission = harness.queue.pop_front().unwrap();
    let (trustee, mut columns) = match submission {
        Submission::Shuffled { trustee, columns } => (trustee, columns),
        other => panic!("expected a shuffle, got {:?}", other),
    };
    assert_eq!(trustee, 1);

    // Swap two outputs after the proof was made
    let column = columns.values_mut().next().unwrap();
    column.shuffled.swap(0, 1);
    harness
        .apply(Submission::Shuffled { trustee, columns })
        .unwrap();

    let state = harness.state();
    assert!(state.is_halted());
    assert_eq!(state.refusals[0].participant, 1);
    assert!(harness.halted.unwrap().contains("shuffle proof"));
}

#[test]
fn agent_rejects_foreign_secret() {
    let mut rng = ChaCha20Rng::from_seed([105u8; 32]);
    let (trustee_1, _) = Trustee::new(&mut rng, 1).unwrap();
    let (_, other_secret) = Trustee::new(&mut rng, 1).unwrap();
    let params = ElectionParameters::new(Uuid::new_v4(), vec![trustee_1.clone()], 1).unwrap();

    assert!(TrusteeAgent::new(trustee_1, other_secret, params).is_err());
}

#[test]
fn keyshare_is_computed_once() {
    let mut harness = Harness::new(106, 2, 2, false);
    harness.run_key_generation();

    let state = harness.state();
    let instruction = Instruction::ComputeKeyshare { trustee: 1 };
    let agent = &mut harness.agents[0];
    let keyshare = agent.private_document().private_keyshare;

    // A repeated instruction is a no-op
    let submissions = agent
        .execute(&mut harness.rng, &state, &instruction)
        .unwrap();
    assert!(submissions.is_empty());
    assert_eq!(agent.private_document().private_keyshare, keyshare);

    match agent.compute_keyshare() {
        Err(Error::KeyshareAlreadyComputed(1)) => {}
        other => panic!("expected already computed, got {:?}", other),
    }
}
