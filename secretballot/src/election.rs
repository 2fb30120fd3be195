use crate::*;
use uuid::Uuid;

/// The published, immutable parameters of an election.
///
/// The group is fixed (Ristretto255 with its standard basepoint), so only the trustee roster,
/// the threshold and the protocol configuration vary between elections.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct ElectionParameters {
    pub election_id: Uuid,

    /// List of trustees taking part in key generation, ordered by index
    pub trustees: Vec<Trustee>,

    /// Number of coefficients in every trustee's polynomial (its degree plus one)
    pub threshold: u8,

    #[serde(default)]
    pub config: ProtocolConfig,
}

impl ElectionParameters {
    /// Create and validate a new set of election parameters
    pub fn new(election_id: Uuid, trustees: Vec<Trustee>, threshold: u8) -> Result<Self, Error> {
        let params = ElectionParameters {
            election_id,
            trustees,
            threshold,
            config: ProtocolConfig::default(),
        };
        params.validate()?;

        let n = params.trustees.len();
        if (params.threshold as usize) < n {
            // Keyshares are additive, so decryption still needs every trustee
            warn!(
                "election {}: threshold {} is below trustee count {}; all {} trustees are still required to decrypt",
                params.election_id, params.threshold, n, n
            );
        }

        Ok(params)
    }

    /// Check the roster and threshold are consistent
    pub fn validate(&self) -> Result<(), Error> {
        let n = self.trustees.len();
        if n == 0 {
            return Err(Error::InvalidParameters("no trustees".to_owned()));
        }
        if n > u8::max_value() as usize {
            return Err(Error::InvalidParameters(format!("too many trustees: {}", n)));
        }

        // Trustees must be exactly 1..=n in order
        for (position, trustee) in self.trustees.iter().enumerate() {
            if trustee.index as usize != position + 1 {
                return Err(Error::InvalidParameters(format!(
                    "trustee at position {} has index {}, expected {}",
                    position,
                    trustee.index,
                    position + 1
                )));
            }
        }

        if self.threshold == 0 || self.threshold as usize > n {
            return Err(Error::InvalidParameters(format!(
                "threshold {} must be between 1 and {}",
                self.threshold, n
            )));
        }

        Ok(())
    }

    pub fn num_trustees(&self) -> usize {
        self.trustees.len()
    }

    /// Get a trustee with the given index
    pub fn get_trustee(&self, index: u8) -> Option<&Trustee> {
        self.trustees.iter().find(|t| t.index == index)
    }

    /// Indexes of all trustees, in chain order
    pub fn indexes(&self) -> impl Iterator<Item = u8> + '_ {
        self.trustees.iter().map(|t| t.index)
    }

    /// Verified shares a trustee needs from the others before computing its keyshare.
    ///
    /// Keyshares are sums over every dealer, so a share from each other trustee is required
    /// whatever the threshold.
    pub fn keyshare_quorum(&self) -> usize {
        self.trustees.len().saturating_sub(1)
    }

    /// Index of the last trustee in the shuffle chain
    pub fn last_index(&self) -> u8 {
        self.trustees.len() as u8
    }
}
