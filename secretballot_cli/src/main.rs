#[macro_use]
extern crate log;

use clap::{App, Arg, SubCommand};

mod command_e2e;
mod command_keygen;
mod command_verify_shuffle;
mod config;

use command_e2e::command_e2e;
use command_keygen::command_keygen;
use command_verify_shuffle::command_verify_shuffle;

fn main() {
    let matches = App::new("SecretBallot CLI")
        .version("1.0")
        .author("Patrick Hayes <patrick.d.hayes@gmail.com>")
        .about("Runs and verifies threshold-encrypted, mixnet-shuffled elections")
        .arg(
            Arg::with_name("v")
                .short("v")
                .multiple(true)
                .help("Sets the level of verbosity"),
        )
        .subcommand(
            SubCommand::with_name("keygen")
                .about("Generate a trustee encryption keypair")
                .arg(
                    Arg::with_name("index")
                        .long("index")
                        .takes_value(true)
                        .required(true)
                        .help("Position of the trustee in the shuffle chain, starting at 1"),
                )
                .arg(
                    Arg::with_name("secret")
                        .long("secret")
                        .takes_value(true)
                        .help("Write the secret key to this file instead of printing it"),
                ),
        )
        .subcommand(
            SubCommand::with_name("e2e")
                .about("Run a complete simulated election from key generation to totals")
                .arg(
                    Arg::with_name("trustees")
                        .long("trustees")
                        .takes_value(true)
                        .help("Number of trustees - can also be set with SECRETBALLOT_TRUSTEES"),
                )
                .arg(
                    Arg::with_name("threshold")
                        .long("threshold")
                        .takes_value(true)
                        .help("Polynomial threshold - can also be set with SECRETBALLOT_THRESHOLD"),
                )
                .arg(
                    Arg::with_name("ballots")
                        .long("ballots")
                        .takes_value(true)
                        .help("Number of random ballots to cast - can also be set with SECRETBALLOT_BALLOTS"),
                )
                .arg(
                    Arg::with_name("vote")
                        .long("vote")
                        .takes_value(true)
                        .multiple(true)
                        .number_of_values(1)
                        .help("Cast this ballot, e.g. \"president=Alice,measure=yes\" - replaces the random ballots"),
                )
                .arg(
                    Arg::with_name("fast-shuffle")
                        .long("fast-shuffle")
                        .help("Publish shuffles before their proofs - can also be set with SECRETBALLOT_FAST_SHUFFLE"),
                )
                .arg(
                    Arg::with_name("print-votes")
                        .long("print-votes")
                        .help("Print every decrypted ballot"),
                )
                .arg(
                    Arg::with_name("output")
                        .long("output")
                        .takes_value(true)
                        .help("Directory to write params.json and state.json to"),
                ),
        )
        .subcommand(
            SubCommand::with_name("verify-shuffle")
                .about("Verify every shuffle proof of a stored election")
                .arg(
                    Arg::with_name("PARAMS")
                        .index(1)
                        .required(true)
                        .help("Election parameters in JSON format"),
                )
                .arg(
                    Arg::with_name("STATE")
                        .index(2)
                        .required(true)
                        .help("Election state in JSON format"),
                ),
        )
        .get_matches();

    let level = match matches.occurrences_of("v") {
        0 => log::LevelFilter::Warn,
        1 => log::LevelFilter::Info,
        2 => log::LevelFilter::Debug,
        _ => log::LevelFilter::Trace,
    };
    env_logger::Builder::from_default_env()
        .filter_level(level)
        .init();

    // Subcommands
    if let Some(matches) = matches.subcommand_matches("keygen") {
        command_keygen(matches);
        std::process::exit(0);
    }

    if let Some(matches) = matches.subcommand_matches("e2e") {
        command_e2e(matches);
        std::process::exit(0);
    }

    if let Some(matches) = matches.subcommand_matches("verify-shuffle") {
        command_verify_shuffle(matches);
        std::process::exit(0);
    }

    eprintln!("secretballot: a subcommand is required, see --help");
    std::process::exit(1);
}

pub fn expand(input: &str) -> String {
    shellexpand::full(input)
        .map(|s| s.into_owned())
        .unwrap_or_else(|e| {
            eprintln!("secretballot: unable to expand {}: {}", input, e);
            std::process::exit(1);
        })
}
