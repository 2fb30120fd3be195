use secretballot::*;

/// Independently re-verify every shuffle proof recorded in an election state
pub fn command_verify_shuffle(matches: &clap::ArgMatches) {
    // Unwraps are OK, both these args are required
    let params: ElectionParameters = read_json(&crate::expand(matches.value_of("PARAMS").unwrap()));
    let state: ElectionState = read_json(&crate::expand(matches.value_of("STATE").unwrap()));

    if let Err(e) = params.validate() {
        eprintln!("secretballot verify-shuffle: {}", e);
        std::process::exit(1);
    }
    if state.election_id != params.election_id {
        eprintln!("secretballot verify-shuffle: state and parameters are for different elections");
        std::process::exit(1);
    }

    let public_key = match state.threshold_public_key {
        Some(public_key) => public_key,
        None => {
            eprintln!("secretballot verify-shuffle: election has no public key");
            std::process::exit(1);
        }
    };

    let mut failures = 0;
    for trustee in state.trustees.values() {
        for (column, shuffled) in trustee.shuffled.iter() {
            let proof = match shuffled.proof.as_ref() {
                Some(proof) => proof,
                None => {
                    println!("trustee {} column {}: proof missing", trustee.index, column);
                    failures += 1;
                    continue;
                }
            };

            let input = match state.shuffle_input(trustee.index, column) {
                Ok(input) => input,
                Err(e) => {
                    println!("trustee {} column {}: {}", trustee.index, column, e);
                    failures += 1;
                    continue;
                }
            };

            let context = ShuffleContext::new(params.election_id, trustee.index, column);
            if verify_shuffle(&public_key, &input, &shuffled.shuffled, proof, &context) {
                println!("trustee {} column {}: OK", trustee.index, column);
            } else {
                println!("trustee {} column {}: INVALID", trustee.index, column);
                failures += 1;
            }
        }
    }

    if failures > 0 {
        eprintln!("secretballot verify-shuffle: {} shuffles failed", failures);
        std::process::exit(1);
    }
    println!("> Shuffles verified OK");
}

fn read_json<T: serde::de::DeserializeOwned>(location: &str) -> T {
    let bytes = std::fs::read(location).unwrap_or_else(|e| {
        eprintln!("secretballot verify-shuffle: unable to read {}: {}", location, e);
        std::process::exit(1);
    });
    serde_json::from_slice(&bytes).unwrap_or_else(|e| {
        eprintln!("secretballot verify-shuffle: unable to read {}: {}", location, e);
        std::process::exit(1);
    })
}
