use crate::config::Config;
use curve25519_dalek::ristretto::RistrettoPoint;
use indexmap::IndexMap;
use rand::seq::SliceRandom;
use secretballot::*;
use std::fs::File;
use std::io::prelude::*;
use tokio::sync::mpsc;
use uuid::Uuid;

const CANDIDATES: &[(&str, &[&str])] = &[
    ("president", &["Alice", "Bob", "Carol"]),
    ("measure", &["yes", "no", BLANK]),
];

type AgentReply = Result<Submission, (u8, Error)>;

/// Run a complete simulated election: every trustee is its own task, talking to the
/// orchestrator only through channels.
pub fn command_e2e(matches: &clap::ArgMatches) {
    let config = Config::from_env().with_matches(matches);

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .unwrap_or_else(|e| {
            eprintln!("secretballot e2e: cannot start runtime: {}", e);
            std::process::exit(1);
        });

    let (params, state) = runtime.block_on(run_election(&config));

    if matches.is_present("print-votes") {
        println!("Votes:");
        for record in state.decrypted.iter().flatten() {
            let selections: Vec<String> = record
                .selections
                .iter()
                .map(|(k, v)| format!("{}={}", k, v))
                .collect();
            println!("  {} {}", record.tracking, selections.join(" "));
        }
    }

    println!("Results:");
    for (column, totals) in state.totals.iter().flatten() {
        println!("  {} ({} votes)", column, totals.num_votes);
        for total in totals.totals.iter() {
            println!("    {}: {}", total.selection, total.count);
        }
    }

    if !state.invalid.is_empty() {
        println!("Not counted:");
        for item in state.invalid.iter() {
            println!("  {} row {}: {}", item.column, item.row, item.reason);
        }
    }

    if let Some(dir) = matches.value_of("output") {
        let dir = crate::expand(dir);
        write_json(&format!("{}/params.json", dir), &params);
        write_json(&format!("{}/state.json", dir), &state);
    }
}

async fn run_election(config: &Config) -> (ElectionParameters, ElectionState) {
    let mut rng = rand::rngs::OsRng;

    let mut trustees = Vec::with_capacity(config.trustees as usize);
    let mut secrets = Vec::with_capacity(config.trustees as usize);
    for index in 1..=config.trustees {
        let (trustee, secret) = Trustee::new(&mut rng, index).unwrap_or_else(|e| exit(e));
        trustees.push(trustee);
        secrets.push(secret);
    }

    let mut params = ElectionParameters::new(Uuid::new_v4(), trustees, config.threshold)
        .unwrap_or_else(|e| exit(e));
    params.config.fast_shuffle = config.fast_shuffle;
    info!(
        "election {}: {} trustees, threshold {}, fast shuffle {}",
        params.election_id, config.trustees, config.threshold, config.fast_shuffle
    );

    let mut store = MemStore::default();
    store
        .put_state(&ElectionState::new(&params))
        .unwrap_or_else(|e| exit(e));

    // Spawn the trustees
    let (reply_tx, mut replies) = mpsc::unbounded_channel::<AgentReply>();
    let mut agents = Vec::with_capacity(secrets.len());
    for (trustee, secret) in params.trustees.clone().into_iter().zip(secrets.into_iter()) {
        let agent = TrusteeAgent::new(trustee, secret, params.clone()).unwrap_or_else(|e| exit(e));
        let (tx, rx) = mpsc::unbounded_channel();
        reply_tx.send(Ok(agent.start())).ok();
        tokio::spawn(run_trustee(agent, rx, reply_tx.clone()));
        agents.push(tx);
    }
    drop(reply_tx);

    let mut voting_done = false;
    while let Some(reply) = replies.recv().await {
        let submission = reply.unwrap_or_else(|(trustee, e)| {
            eprintln!("secretballot e2e: trustee {} failed: {}", trustee, e);
            std::process::exit(1);
        });

        let instructions = apply(&params, &mut store, submission);
        for instruction in instructions {
            match &instruction {
                Instruction::Halt { reason } => {
                    eprintln!("secretballot e2e: election halted: {}", reason);
                    std::process::exit(1);
                }
                Instruction::Blocked { trustee, reason } => {
                    eprintln!("secretballot e2e: trustee {} blocked: {}", trustee, reason);
                    std::process::exit(1);
                }
                Instruction::PublishResults => {
                    let state = current_state(&store, &params);
                    return (params, state);
                }
                Instruction::Wait { reason } => debug!("waiting for {}", reason),
                _ => {}
            }

            let state = current_state(&store, &params);
            for agent in agents.iter() {
                agent.send((state.clone(), instruction.clone())).ok();
            }
        }

        // Voting opens once every keyshare has been tested
        let state = current_state(&store, &params);
        if !voting_done && state.trustees.values().all(|t| t.keyshare_test.is_some()) {
            voting_done = true;
            let public_key = state.threshold_public_key.unwrap_or_else(|| {
                eprintln!("secretballot e2e: keyshares tested without a public key");
                std::process::exit(1);
            });
            if config.votes.is_empty() {
                cast_random_ballots(&mut rng, &params, &mut store, &public_key, config.ballots);
            } else {
                for vote in config.votes.iter() {
                    let selections: IndexMap<String, String> = vote.iter().cloned().collect();
                    cast_ballot(&mut rng, &params, &mut store, &public_key, &selections);
                }
                info!("cast {} ballots", config.votes.len());
            }

            for instruction in apply(&params, &mut store, Submission::CloseVoting) {
                let state = current_state(&store, &params);
                for agent in agents.iter() {
                    agent.send((state.clone(), instruction.clone())).ok();
                }
            }
        }
    }

    eprintln!("secretballot e2e: every trustee stopped before the election finished");
    std::process::exit(1);
}

async fn run_trustee(
    mut agent: TrusteeAgent,
    mut instructions: mpsc::UnboundedReceiver<(ElectionState, Instruction)>,
    replies: mpsc::UnboundedSender<AgentReply>,
) {
    let mut rng = rand::rngs::OsRng;
    while let Some((state, instruction)) = instructions.recv().await {
        // Shuffling and proving are CPU bound
        let result =
            tokio::task::block_in_place(|| agent.execute(&mut rng, &state, &instruction));
        match result {
            Ok(submissions) => {
                for submission in submissions {
                    if replies.send(Ok(submission)).is_err() {
                        return;
                    }
                }
            }
            Err(e) => {
                error!("trustee {}: {}", agent.index(), e);
                replies.send(Err((agent.index(), e))).ok();
                return;
            }
        }
    }
}

fn cast_random_ballots<R: rand::RngCore + rand::CryptoRng>(
    rng: &mut R,
    params: &ElectionParameters,
    store: &mut MemStore,
    public_key: &RistrettoPoint,
    count: usize,
) {
    for _ in 0..count {
        let mut selections = IndexMap::new();
        for (column, choices) in CANDIDATES.iter() {
            let choice = choices.choose(rng).unwrap_or(&BLANK);
            selections.insert(column.to_string(), choice.to_string());
        }
        cast_ballot(rng, params, store, public_key, &selections);
    }
    info!("cast {} random ballots", count);
}

fn cast_ballot<R: rand::RngCore + rand::CryptoRng>(
    rng: &mut R,
    params: &ElectionParameters,
    store: &mut MemStore,
    public_key: &RistrettoPoint,
    selections: &IndexMap<String, String>,
) {
    let tracking = generate_tracking_number(rng);
    let ballot = encrypt_ballot(rng, public_key, &tracking, selections, &params.config)
        .unwrap_or_else(|e| exit(e));
    apply(params, store, Submission::Vote { ballot });
}

fn apply(
    params: &ElectionParameters,
    store: &mut MemStore,
    submission: Submission,
) -> Vec<Instruction> {
    let snapshot = current_state(store, params);
    let step = transition(params, &snapshot, submission).unwrap_or_else(|e| exit(e));
    debug!(
        "version {}: {:?} changed {:?}",
        step.notification.version, step.notification.participant, step.notification.fields
    );
    store.put_state(&step.state).unwrap_or_else(|e| exit(e));
    step.instructions
}

fn current_state(store: &MemStore, params: &ElectionParameters) -> ElectionState {
    match store.get_state(params.election_id) {
        Ok(Some(state)) => state,
        Ok(None) => {
            eprintln!("secretballot e2e: election state missing");
            std::process::exit(1);
        }
        Err(e) => exit(e),
    }
}

fn write_json<T: serde::Serialize>(location: &str, value: &T) {
    let json = serde_json::to_string_pretty(value).unwrap_or_else(|e| {
        eprintln!("secretballot e2e: {}", e);
        std::process::exit(1);
    });
    let mut file = File::create(location).unwrap_or_else(|e| {
        eprintln!("secretballot e2e: cannot create file {}: {}", location, e);
        std::process::exit(1);
    });
    file.write_all(json.as_bytes()).unwrap_or_else(|e| {
        eprintln!("secretballot e2e: unable to write {}: {}", location, e);
        std::process::exit(1);
    });
}

fn exit(e: Error) -> ! {
    eprintln!("secretballot e2e: {}", e);
    std::process::exit(1);
}
