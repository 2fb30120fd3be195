use thiserror::Error;

/// Error types
#[derive(Debug, Error)]
pub enum Error {
    #[error("secretballot: malformed input: {0}")]
    MalformedInput(String),

    #[error("secretballot: invalid hexidecimal: {0}")]
    BadHex(#[from] hex::FromHexError),

    #[error("secretballot: JSON error: {0}")]
    JSON(#[from] serde_json::Error),

    #[error("secretballot: payload of {0} bytes exceeds embeddable capacity of {1} bytes")]
    PayloadTooLarge(usize, usize),

    #[error("secretballot: ran out of embedding attempts: {0}")]
    EncodingExhausted(usize),

    #[error("secretballot: ecies: {0}")]
    Ecies(&'static str),

    #[error("secretballot: invalid election parameters: {0}")]
    InvalidParameters(String),

    #[error("secretballot: trustee {0} does not exist in election")]
    TrusteeDoesNotExist(u8),

    #[error("secretballot: failed to decrypt pairwise share from trustee {0}")]
    ShareDecryptionFailed(u8),

    #[error("secretballot: pairwise share from trustee {from} to trustee {trustee} failed commitment verification")]
    ShareVerificationFailed { trustee: u8, from: u8 },

    #[error("secretballot: keyshare for trustee {0} has already been computed")]
    KeyshareAlreadyComputed(u8),

    #[error("secretballot: keyshare for trustee {0} has not been computed")]
    KeyshareMissing(u8),

    #[error("secretballot: cannot shuffle an empty column")]
    EmptyShuffle,

    #[error("secretballot: mismatched lengths: expected {0}, found {1}")]
    MismatchedLength(usize, usize),

    #[error("secretballot: shuffle proof from trustee {trustee} for column '{column}' failed to verify")]
    ShuffleProofInvalid { trustee: u8, column: String },

    #[error("secretballot: partial decryption proof from trustee {trustee} for column '{column}' row {row} failed to verify")]
    PartialProofInvalid {
        trustee: u8,
        column: String,
        row: usize,
    },

    #[error("secretballot: not enough partial decryptions: need {0}, found {1}")]
    NotEnoughPartials(usize, usize),

    #[error("secretballot: submission rejected: {0}")]
    OutOfOrder(String),

    #[error("secretballot: stale state: stored version {0}, offered version {1}")]
    StaleState(u64, u64),
}

impl Error {
    /// Proof failures indicate either a bug or an active attack and must halt forward progress
    /// until a human has looked at the data.
    pub fn is_adversarial(&self) -> bool {
        matches!(
            self,
            Error::ShuffleProofInvalid { .. } | Error::PartialProofInvalid { .. }
        )
    }

    pub(crate) fn malformed<S: Into<String>>(msg: S) -> Self {
        Error::MalformedInput(msg.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn adversarial_errors() {
        let shuffle = Error::ShuffleProofInvalid {
            trustee: 2,
            column: "president".to_owned(),
        };
        assert!(shuffle.is_adversarial());
        assert_eq!(
            format!("{}", shuffle),
            "secretballot: shuffle proof from trustee 2 for column 'president' failed to verify"
        );

        assert!(!Error::EncodingExhausted(1000).is_adversarial());
        let failed = Error::ShareVerificationFailed {
            trustee: 1,
            from: 3,
        };
        assert!(!failed.is_adversarial());
        assert_eq!(
            format!("{}", failed),
            "secretballot: pairwise share from trustee 3 to trustee 1 failed commitment verification"
        );
    }
}
