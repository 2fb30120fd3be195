use std::env::var;

/// Settings for a simulated election, read from the environment and overridable on the
/// command line.
pub struct Config {
    pub trustees: u8,
    pub threshold: u8,
    pub fast_shuffle: bool,
    pub ballots: usize,

    /// Explicit ballots, each a list of `column=selection` pairs
    pub votes: Vec<Vec<(String, String)>>,
}

impl Config {
    pub fn from_env() -> Self {
        let trustees: u8 = match var("SECRETBALLOT_TRUSTEES") {
            Ok(val) => val.parse().unwrap_or_else(|e| {
                eprintln!("secretballot: invalid SECRETBALLOT_TRUSTEES {}: {}", val, e);
                std::process::exit(1);
            }),
            Err(_e) => 3,
        };

        let threshold: u8 = match var("SECRETBALLOT_THRESHOLD") {
            Ok(val) => val.parse().unwrap_or_else(|e| {
                eprintln!("secretballot: invalid SECRETBALLOT_THRESHOLD {}: {}", val, e);
                std::process::exit(1);
            }),
            // Every trustee
            Err(_e) => trustees,
        };

        let fast_shuffle = match var("SECRETBALLOT_FAST_SHUFFLE") {
            Ok(val) => val == "1" || val.eq_ignore_ascii_case("true"),
            Err(_e) => false,
        };

        let ballots: usize = match var("SECRETBALLOT_BALLOTS") {
            Ok(val) => val.parse().unwrap_or_else(|e| {
                eprintln!("secretballot: invalid SECRETBALLOT_BALLOTS {}: {}", val, e);
                std::process::exit(1);
            }),
            Err(_e) => 10,
        };

        Config {
            trustees,
            threshold,
            fast_shuffle,
            ballots,
            votes: vec![],
        }
    }

    /// Apply command line overrides
    pub fn with_matches(mut self, matches: &clap::ArgMatches) -> Self {
        if let Some(val) = matches.value_of("trustees") {
            self.trustees = parse_arg("trustees", val);
            if matches.value_of("threshold").is_none() && var("SECRETBALLOT_THRESHOLD").is_err() {
                self.threshold = self.trustees;
            }
        }
        if let Some(val) = matches.value_of("threshold") {
            self.threshold = parse_arg("threshold", val);
        }
        if let Some(val) = matches.value_of("ballots") {
            self.ballots = parse_arg("ballots", val);
        }
        if let Some(votes) = matches.values_of("vote") {
            self.votes = votes.map(parse_vote).collect();
        }
        if matches.is_present("fast-shuffle") {
            self.fast_shuffle = true;
        }
        self
    }
}

fn parse_arg<T: std::str::FromStr>(name: &str, val: &str) -> T
where
    T::Err: std::fmt::Display,
{
    val.parse().unwrap_or_else(|e| {
        eprintln!("secretballot: invalid --{} {}: {}", name, val, e);
        std::process::exit(1);
    })
}

fn parse_vote(vote: &str) -> Vec<(String, String)> {
    vote.split(',')
        .map(|pair| match pair.split_once('=') {
            Some((column, selection)) if !column.trim().is_empty() => {
                (column.trim().to_owned(), selection.trim().to_owned())
            }
            _ => {
                eprintln!("secretballot: invalid --vote {}: expected column=selection", vote);
                std::process::exit(1);
            }
        })
        .collect()
}
