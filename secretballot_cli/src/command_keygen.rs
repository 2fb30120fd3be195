use secretballot::Trustee;
use std::fs::File;
use std::io::prelude::*;

pub fn command_keygen(matches: &clap::ArgMatches) {
    // Unwrap is OK, index is required
    let index: u8 = matches.value_of("index").unwrap().parse().unwrap_or_else(|e| {
        eprintln!("secretballot keygen: invalid index: {}", e);
        std::process::exit(1);
    });

    let (trustee, secret) = Trustee::new(&mut rand::rngs::OsRng, index).unwrap_or_else(|e| {
        eprintln!("secretballot keygen: {}", e);
        std::process::exit(1);
    });

    match matches.value_of("secret") {
        Some(location) => {
            let location = crate::expand(location);
            let mut file = File::create(&location).unwrap_or_else(|e| {
                eprintln!("secretballot keygen: cannot create file {}: {}", &location, e);
                std::process::exit(1);
            });
            file.write_all(secret.to_hex().as_bytes())
                .unwrap_or_else(|e| {
                    eprintln!(
                        "secretballot keygen: unable to write secret to {}: {}",
                        &location, e
                    );
                    std::process::exit(1);
                });
        }
        None => println!("secret-key: {}", secret.to_hex()),
    }

    let trustee = serde_json::to_string_pretty(&trustee).unwrap_or_else(|e| {
        eprintln!("secretballot keygen: {}", e);
        std::process::exit(1);
    });
    println!("{}", trustee);
}
