use crate::*;
use std::collections::BTreeMap;
use uuid::Uuid;

/// A document store
///
/// Documents are stored as JSON strings under `<election_id>/<name>` keys. Shared state is
/// versioned: writing a snapshot that is not newer than the stored one is rejected.
pub trait Store {
    /// Get a raw document
    fn get_document(&self, key: &str) -> Option<String>;

    /// Store a raw document, replacing any previous value
    fn put_document(&mut self, key: &str, document: String);

    /// Get an election's shared state
    fn get_state(&self, election_id: Uuid) -> Result<Option<ElectionState>, Error> {
        match self.get_document(&state_key(election_id)) {
            Some(doc) => Ok(Some(serde_json::from_str(&doc)?)),
            None => Ok(None),
        }
    }

    /// Store an election's shared state
    fn put_state(&mut self, state: &ElectionState) -> Result<(), Error> {
        if let Some(stored) = self.get_state(state.election_id)? {
            if stored.version >= state.version {
                return Err(Error::StaleState(stored.version, state.version));
            }
        }
        let doc = serde_json::to_string(state)?;
        self.put_document(&state_key(state.election_id), doc);
        Ok(())
    }

    /// Get a trustee's private document
    fn get_private(&self, election_id: Uuid, trustee: u8) -> Result<Option<PrivateDocument>, Error> {
        match self.get_document(&private_key(election_id, trustee)) {
            Some(doc) => Ok(Some(serde_json::from_str(&doc)?)),
            None => Ok(None),
        }
    }

    /// Store a trustee's private document
    fn put_private(
        &mut self,
        election_id: Uuid,
        trustee: u8,
        private: &PrivateDocument,
    ) -> Result<(), Error> {
        let doc = serde_json::to_string(private)?;
        self.put_document(&private_key(election_id, trustee), doc);
        Ok(())
    }
}

fn state_key(election_id: Uuid) -> String {
    format!("{}/state", election_id)
}

fn private_key(election_id: Uuid, trustee: u8) -> String {
    format!("{}/private/{}", election_id, trustee)
}

/// A simple store that uses an in-memory BTreeMap
#[derive(Default, Clone)]
pub struct MemStore {
    inner: BTreeMap<String, String>,
}

impl MemStore {
    /// All keys stored for an election
    pub fn keys_for(&self, election_id: Uuid) -> Vec<String> {
        let prefix = format!("{}/", election_id);
        self.inner
            .range(prefix.clone()..)
            .take_while(|(k, _)| k.starts_with(&prefix))
            .map(|(k, _)| k.clone())
            .collect()
    }
}

impl Store for MemStore {
    fn get_document(&self, key: &str) -> Option<String> {
        self.inner.get(key).cloned()
    }

    fn put_document(&mut self, key: &str, document: String) {
        self.inner.insert(key.to_owned(), document);
    }
}
