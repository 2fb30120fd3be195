use crate::*;

/// Tunable protocol behaviour shared by every participant in an election.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
#[serde(default)]
pub struct ProtocolConfig {
    /// How many random candidates `embed` tries before giving up
    pub embed_attempts: usize,

    /// Verify shuffle and decryption proofs across columns and rows in parallel
    pub parallel_verify: bool,

    /// Publish shuffled columns first and their proofs in a later step
    pub fast_shuffle: bool,
}

impl Default for ProtocolConfig {
    fn default() -> Self {
        ProtocolConfig {
            embed_attempts: DEFAULT_EMBED_ATTEMPTS,
            parallel_verify: true,
            fast_shuffle: false,
        }
    }
}
