//! The documents that make up an election's shared and private state.
//!
//! Field names follow the stored JSON documents: `commitments`, `encrypted_pairwise_shares_for`,
//! `decrypted_shares_from`, `verified`, `private_keyshare`, `threshold_public_key`, `shuffled`,
//! `partials` and `decrypted`.

use crate::*;
use curve25519_dalek::ristretto::RistrettoPoint;
use curve25519_dalek::scalar::Scalar;
use indexmap::IndexMap;
use uuid::Uuid;
use zeroize::Zeroize;

/// One trustee's shuffle of one column
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct ShuffledColumn {
    pub shuffled: Vec<Ciphertext>,

    /// Absent until published; a fast shuffle publishes it after the column itself
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub proof: Option<ShuffleProof>,
}

/// Everything a trustee has published
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Default)]
pub struct TrusteeDocument {
    pub index: u8,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub commitments: Option<Commitment>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub encrypted_pairwise_shares_for: Option<IndexMap<u8, EncryptedShare>>,

    /// This trustee's verdict on the share received from each other trustee
    #[serde(default)]
    pub verified: IndexMap<u8, ShareVerification>,

    /// Partial decryption of the keyshare test lock
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub keyshare_test: Option<PartialDecryption>,

    #[serde(default)]
    pub shuffled: IndexMap<String, ShuffledColumn>,

    #[serde(default)]
    pub partials: IndexMap<String, Vec<PartialDecryption>>,
}

impl TrusteeDocument {
    pub fn new(index: u8) -> Self {
        TrusteeDocument {
            index,
            ..Default::default()
        }
    }

    /// Number of other trustees whose shares passed verification
    pub fn passed_count(&self) -> usize {
        self.verified
            .values()
            .filter(|v| **v == ShareVerification::Passed)
            .count()
    }

    pub fn has_failed_verification(&self) -> bool {
        self.verified.values().any(|v| *v == ShareVerification::Failed)
    }

    /// Shuffled every column, and published a proof for each
    pub fn shuffle_proven(&self, columns: &[String]) -> bool {
        columns.iter().all(|c| {
            self.shuffled
                .get(c)
                .map(|s| s.proof.is_some())
                .unwrap_or(false)
        })
    }

    pub fn has_shuffled(&self, columns: &[String]) -> bool {
        columns.iter().all(|c| self.shuffled.contains_key(c))
    }
}

/// A trustee's private bookkeeping. Never leaves the trustee.
#[derive(Serialize, Deserialize, Clone, Default)]
pub struct PrivateDocument {
    /// Decrypted shares that passed verification, by sender. Includes the self-share.
    #[serde(with = "scalar_map_hex", default)]
    pub decrypted_shares_from: IndexMap<u8, Scalar>,

    #[serde(with = "opt_scalar_hex", default)]
    pub private_keyshare: Option<Scalar>,
}

impl Drop for PrivateDocument {
    fn drop(&mut self) {
        for share in self.decrypted_shares_from.values_mut() {
            share.zeroize();
        }
        if let Some(keyshare) = self.private_keyshare.as_mut() {
            keyshare.zeroize();
        }
    }
}

impl std::fmt::Debug for PrivateDocument {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PrivateDocument")
            .field("decrypted_shares_from", &self.decrypted_shares_from.keys())
            .field("private_keyshare", &self.private_keyshare.is_some())
            .finish()
    }
}

/// A proof failure that stopped the election until someone investigates
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct Refusal {
    /// Trustee whose published data failed to verify
    pub participant: u8,
    pub error: String,
}

/// A versioned snapshot of everything published in an election
#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct ElectionState {
    /// Incremented on every accepted submission
    pub version: u64,

    pub election_id: Uuid,

    pub trustees: IndexMap<u8, TrusteeDocument>,

    #[serde(default)]
    pub votes: Vec<EncryptedBallot>,

    #[serde(default)]
    pub voting_closed: bool,

    #[serde(with = "opt_point_hex", default)]
    pub threshold_public_key: Option<RistrettoPoint>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub decrypted: Option<Vec<DecryptedRecord>>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub totals: Option<IndexMap<String, ColumnTotals>>,

    /// Decrypted items that were not counted
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub invalid: Vec<InvalidItem>,

    #[serde(default)]
    pub refusals: Vec<Refusal>,
}

impl ElectionState {
    /// The empty state of a freshly published election
    pub fn new(params: &ElectionParameters) -> Self {
        ElectionState {
            version: 0,
            election_id: params.election_id,
            trustees: params
                .indexes()
                .map(|i| (i, TrusteeDocument::new(i)))
                .collect(),
            votes: vec![],
            voting_closed: false,
            threshold_public_key: None,
            decrypted: None,
            totals: None,
            invalid: vec![],
            refusals: vec![],
        }
    }

    pub fn trustee(&self, index: u8) -> Result<&TrusteeDocument, Error> {
        self.trustees
            .get(&index)
            .ok_or(Error::TrusteeDoesNotExist(index))
    }

    pub(crate) fn trustee_mut(&mut self, index: u8) -> Result<&mut TrusteeDocument, Error> {
        self.trustees
            .get_mut(&index)
            .ok_or(Error::TrusteeDoesNotExist(index))
    }

    /// A proof has failed and nothing may proceed
    pub fn is_halted(&self) -> bool {
        !self.refusals.is_empty()
    }

    /// Every trustee's commitment, in index order, once all are published
    pub fn all_commitments(&self) -> Option<Vec<&Commitment>> {
        self.trustees
            .values()
            .map(|t| t.commitments.as_ref())
            .collect()
    }

    /// Public image of every trustee's keyshare
    pub fn public_keyshares(&self) -> Option<IndexMap<u8, RistrettoPoint>> {
        let commitments = self.all_commitments()?;
        Some(
            self.trustees
                .keys()
                .map(|&i| (i, public_keyshare(i, commitments.iter().cloned())))
                .collect(),
        )
    }

    /// Ballot items, in the order of the first ballot
    pub fn columns(&self) -> Vec<String> {
        self.votes
            .first()
            .map(|v| v.keys().cloned().collect())
            .unwrap_or_default()
    }

    /// The column a trustee has to shuffle: the submitted ballots for the first trustee, the
    /// predecessor's output for everyone else.
    pub fn shuffle_input(&self, trustee: u8, column: &str) -> Result<Vec<Ciphertext>, Error> {
        if trustee <= 1 {
            let mut columns = split_into_columns(&self.votes)?;
            return columns
                .swap_remove(column)
                .ok_or_else(|| Error::malformed(format!("unknown column '{}'", column)));
        }

        self.trustee(trustee - 1)?
            .shuffled
            .get(column)
            .map(|s| s.shuffled.clone())
            .ok_or_else(|| {
                Error::OutOfOrder(format!(
                    "trustee {} has not shuffled column '{}'",
                    trustee - 1,
                    column
                ))
            })
    }

    /// Output of the last trustee in the chain for a column
    pub fn final_shuffle(&self, column: &str) -> Option<&ShuffledColumn> {
        self.trustees
            .values()
            .last()
            .and_then(|t| t.shuffled.get(column))
    }

    /// Every trustee has shuffled every column and every shuffle proof is published
    pub fn shuffle_chain_complete(&self) -> bool {
        let columns = self.columns();
        !columns.is_empty() && self.trustees.values().all(|t| t.shuffle_proven(&columns))
    }
}
