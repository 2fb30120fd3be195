use crate::*;
use curve25519_dalek::ristretto::RistrettoPoint;
use indexmap::IndexMap;
use rand::{CryptoRng, RngCore};

/// Selection recorded for an item the voter left empty. Never counted.
pub const BLANK: &str = "BLANK";

/// Number of hex characters in a tracking number (64 random bits). This leaves
/// `MAX_EMBED_LENGTH - TRACKING_LENGTH - 1` bytes for the selection itself.
pub const TRACKING_LENGTH: usize = 16;

/// An encrypted ballot: one ciphertext per item (column)
pub type EncryptedBallot = IndexMap<String, Ciphertext>;

/// Generate a random tracking number.
///
/// The same tracking number is embedded in every item of a ballot so the items can be matched
/// up again after each column has been shuffled and decrypted on its own.
pub fn generate_tracking_number<R: RngCore + CryptoRng>(rng: &mut R) -> String {
    let mut bytes = [0u8; TRACKING_LENGTH / 2];
    rng.fill_bytes(&mut bytes);
    hex::encode(bytes)
}

/// The plaintext for one ballot item: `<tracking>:<selection>`
pub fn encode_item(tracking: &str, selection: &str) -> String {
    format!("{}:{}", tracking, selection)
}

/// Split a decrypted item back into its tracking number and selection
pub fn split_item(plaintext: &str) -> Result<(&str, &str), Error> {
    let mut parts = plaintext.splitn(2, ':');
    match (parts.next(), parts.next()) {
        (Some(tracking), Some(selection)) if !tracking.is_empty() => Ok((tracking, selection)),
        _ => Err(Error::malformed(format!(
            "decrypted item '{}' has no tracking number",
            plaintext
        ))),
    }
}

/// Encrypt every selection of a ballot under the election public key
pub fn encrypt_ballot<R: RngCore + CryptoRng>(
    rng: &mut R,
    public_key: &RistrettoPoint,
    tracking: &str,
    selections: &IndexMap<String, String>,
    config: &ProtocolConfig,
) -> Result<EncryptedBallot, Error> {
    let mut ballot = IndexMap::with_capacity(selections.len());
    for (column, selection) in selections.iter() {
        let plaintext = encode_item(tracking, selection);
        let point = embed_with_attempts(rng, plaintext.as_bytes(), config.embed_attempts)?;
        ballot.insert(
            column.clone(),
            Ciphertext::encrypt_random(rng, public_key, &point),
        );
    }
    Ok(ballot)
}

/// Turn a list of ballots into one list of ciphertexts per column, in ballot order.
///
/// Every ballot must contain exactly the same items.
pub fn split_into_columns(
    ballots: &[EncryptedBallot],
) -> Result<IndexMap<String, Vec<Ciphertext>>, Error> {
    let mut columns: IndexMap<String, Vec<Ciphertext>> = IndexMap::new();
    let first = match ballots.first() {
        Some(first) => first,
        None => return Ok(columns),
    };

    for column in first.keys() {
        columns.insert(column.clone(), Vec::with_capacity(ballots.len()));
    }

    for (position, ballot) in ballots.iter().enumerate() {
        if ballot.len() != columns.len() {
            return Err(Error::malformed(format!(
                "ballot {} has {} items, expected {}",
                position,
                ballot.len(),
                columns.len()
            )));
        }
        for (column, ciphertexts) in columns.iter_mut() {
            let ciphertext = ballot.get(column).ok_or_else(|| {
                Error::malformed(format!("ballot {} is missing item '{}'", position, column))
            })?;
            ciphertexts.push(*ciphertext);
        }
    }

    Ok(columns)
}

/// A fully decrypted ballot, reassembled by tracking number
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct DecryptedRecord {
    pub tracking: String,

    #[serde(flatten)]
    pub selections: IndexMap<String, String>,
}

/// A decrypted item that could not be attributed to a ballot
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct InvalidItem {
    pub column: String,
    pub row: usize,
    pub value: String,
    pub reason: String,
}

/// Output of `recombine_decrypteds`
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Recombined {
    pub records: Vec<DecryptedRecord>,

    /// Items that are not counted. A voter can encrypt anything, so these never stop the tally.
    pub invalid: Vec<InvalidItem>,
}

/// Recombine independently decrypted columns into per-ballot records via tracking numbers.
///
/// `BLANK` selections are left out of the records. Items without a tracking number, and any
/// second item for a column under an already seen tracking number, are set aside as invalid.
pub fn recombine_decrypteds(decrypted: &IndexMap<String, Vec<String>>) -> Recombined {
    let mut by_tracking: IndexMap<String, DecryptedRecord> = IndexMap::new();
    let mut invalid = Vec::new();

    for (column, values) in decrypted.iter() {
        for (row, value) in values.iter().enumerate() {
            let (tracking, selection) = match split_item(value) {
                Ok(parts) => parts,
                Err(_) => {
                    warn!("column '{}' row {}: no tracking number", column, row);
                    invalid.push(InvalidItem {
                        column: column.clone(),
                        row,
                        value: value.clone(),
                        reason: "no tracking number".to_owned(),
                    });
                    continue;
                }
            };
            if selection == BLANK {
                continue;
            }

            let record = by_tracking
                .entry(tracking.to_owned())
                .or_insert_with(|| DecryptedRecord {
                    tracking: tracking.to_owned(),
                    selections: IndexMap::new(),
                });

            if record.selections.contains_key(column) {
                warn!(
                    "column '{}' row {}: tracking number {} already used",
                    column, row, tracking
                );
                invalid.push(InvalidItem {
                    column: column.clone(),
                    row,
                    value: value.clone(),
                    reason: format!("duplicate tracking number {}", tracking),
                });
                continue;
            }
            record
                .selections
                .insert(column.clone(), selection.to_owned());
        }
    }

    Recombined {
        records: by_tracking.into_iter().map(|(_, record)| record).collect(),
        invalid,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand_chacha::ChaCha20Rng;

    #[test]
    fn test_tracking_number() {
        let mut rng = ChaCha20Rng::from_seed([60u8; 32]);
        let tracking = generate_tracking_number(&mut rng);
        assert_eq!(tracking.len(), TRACKING_LENGTH);
        assert!(tracking.chars().all(|c| c.is_ascii_hexdigit()));
        assert_ne!(tracking, generate_tracking_number(&mut rng));
    }

    #[test]
    fn test_split_item() {
        assert_eq!(split_item("0001:CandidateA").unwrap(), ("0001", "CandidateA"));
        assert_eq!(split_item("0001:a:b").unwrap(), ("0001", "a:b"));
        assert_eq!(split_item("0001:").unwrap(), ("0001", ""));
        assert!(split_item("CandidateA").is_err());
        assert!(split_item(":CandidateA").is_err());
    }

    #[test]
    fn test_encrypt_ballot() {
        let mut rng = ChaCha20Rng::from_seed([61u8; 32]);
        let secret = random_scalar(&mut rng);
        let public_key = base_mul(&secret);

        let mut selections = IndexMap::new();
        selections.insert("president".to_owned(), "Alice".to_owned());
        selections.insert("mayor".to_owned(), BLANK.to_owned());

        let ballot =
            encrypt_ballot(&mut rng, &public_key, "0001", &selections, &Default::default()).unwrap();
        assert_eq!(ballot.keys().collect::<Vec<_>>(), vec!["president", "mayor"]);
        assert_eq!(
            extract_str(&ballot["president"].decrypt(&secret)).unwrap(),
            "0001:Alice"
        );

        // Selections too long to embed are rejected
        let mut long = IndexMap::new();
        long.insert("president".to_owned(), "x".repeat(30));
        assert!(encrypt_ballot(&mut rng, &public_key, "0001", &long, &Default::default()).is_err());
    }

    #[test]
    fn test_split_into_columns() {
        let mut rng = ChaCha20Rng::from_seed([62u8; 32]);
        let public_key = base_mul(&random_scalar(&mut rng));

        let mut selections = IndexMap::new();
        selections.insert("president".to_owned(), "Alice".to_owned());
        selections.insert("mayor".to_owned(), "Bob".to_owned());

        let config = ProtocolConfig::default();
        let a = encrypt_ballot(&mut rng, &public_key, "0001", &selections, &config).unwrap();
        let b = encrypt_ballot(&mut rng, &public_key, "0002", &selections, &config).unwrap();

        let columns = split_into_columns(&[a.clone(), b.clone()]).unwrap();
        assert_eq!(columns["president"], vec![a["president"], b["president"]]);
        assert_eq!(columns["mayor"], vec![a["mayor"], b["mayor"]]);

        let mut missing = b;
        missing.remove("mayor");
        assert!(split_into_columns(&[a, missing]).is_err());

        assert!(split_into_columns(&[]).unwrap().is_empty());
    }

    #[test]
    fn test_recombine() {
        let mut decrypted = IndexMap::new();
        decrypted.insert(
            "president".to_owned(),
            vec!["0002:Bob".to_owned(), "0001:CandidateA".to_owned(), "0003:BLANK".to_owned()],
        );
        decrypted.insert(
            "mayor".to_owned(),
            vec!["0001:Carol".to_owned(), "0003:Dave".to_owned(), "0002:BLANK".to_owned()],
        );

        let Recombined { records, invalid } = recombine_decrypteds(&decrypted);
        assert_eq!(records.len(), 3);
        assert!(invalid.is_empty());

        let first = records.iter().find(|r| r.tracking == "0001").unwrap();
        assert_eq!(first.selections["president"], "CandidateA");
        assert_eq!(first.selections["mayor"], "Carol");

        let second = records.iter().find(|r| r.tracking == "0002").unwrap();
        assert_eq!(second.selections.len(), 1);
        assert!(!second.selections.contains_key("mayor"));

        let json = serde_json::to_value(first).unwrap();
        assert_eq!(json["tracking"], "0001");
        assert_eq!(json["president"], "CandidateA");

    }

    #[test]
    fn test_recombine_sets_aside_invalid_items() {
        let mut decrypted = IndexMap::new();
        decrypted.insert(
            "president".to_owned(),
            vec![
                "0001:Alice".to_owned(),
                "garbage".to_owned(),
                "0002:Bob".to_owned(),
                "0001:Carol".to_owned(),
            ],
        );
        decrypted.insert(
            "measure".to_owned(),
            vec!["0002:yes".to_owned(), "\u{fffd}\u{fffd}".to_owned()],
        );

        let recombined = recombine_decrypteds(&decrypted);
        assert_eq!(recombined.records.len(), 2);
        let first = recombined
            .records
            .iter()
            .find(|r| r.tracking == "0001")
            .unwrap();
        assert_eq!(first.selections["president"], "Alice");

        // Colliding tracking numbers are reported, never overwritten
        assert_eq!(recombined.invalid.len(), 3);
        assert_eq!(recombined.invalid[0].row, 1);
        assert_eq!(recombined.invalid[0].reason, "no tracking number");
        assert_eq!(recombined.invalid[1].value, "0001:Carol");
        assert_eq!(recombined.invalid[1].reason, "duplicate tracking number 0001");
        assert_eq!(recombined.invalid[2].column, "measure");
    }
}
