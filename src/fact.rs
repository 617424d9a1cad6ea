//! Fact records - the persisted unit of data
//!
//! A fact is an identifier plus a line of text. The remote API only supplies
//! the text, so identifiers are always generated locally.

use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

/// Globally unique, immutable identity of a fact.
///
/// Serves as the primary key in the store. Rendered as a hyphenated UUID.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FactId(Uuid);

impl FactId {
    /// Generate a fresh random identifier
    pub fn generate() -> Self {
        Self(Uuid::new_v4())
    }

    pub fn as_uuid(&self) -> &Uuid {
        &self.0
    }

    /// Canonical string form, as stored in the database
    pub fn to_id_string(&self) -> String {
        self.0.hyphenated().to_string()
    }
}

impl FromStr for FactId {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Uuid::parse_str(s.trim())
            .map(FactId)
            .map_err(|_| Error::InvalidFactId(s.to_string()))
    }
}

impl fmt::Display for FactId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.hyphenated())
    }
}

/// A single fact.
///
/// Facts are never mutated once persisted; they are only inserted and deleted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Fact {
    /// Unique identifier for this fact
    pub id: FactId,
    /// The fact content
    pub text: String,
}

impl Fact {
    /// Create a new fact with a freshly generated id
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            id: FactId::generate(),
            text: text.into(),
        }
    }

    /// Create a fact with a known id (used when loading from storage)
    pub fn with_id(id: FactId, text: impl Into<String>) -> Self {
        Self { id, text: text.into() }
    }
}

/// Wire shape of one element of the remote payload: `{"fact": "..."}`
#[derive(Debug, Clone, Deserialize)]
pub(crate) struct RemoteFact {
    pub fact: String,
}

impl From<RemoteFact> for Fact {
    fn from(remote: RemoteFact) -> Self {
        Fact::new(remote.fact)
    }
}

/// Decode a remote payload into facts, assigning each a fresh id.
pub fn decode_facts(body: &[u8]) -> Result<Vec<Fact>> {
    let remote: Vec<RemoteFact> = serde_json::from_slice(body)?;
    Ok(remote.into_iter().map(Fact::from).collect())
}
