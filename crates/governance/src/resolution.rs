//! Resolution and ballot records

use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use coopvote_common::{MemberId, ScopeId};

use crate::{GovernanceError, GovernanceResult};

/// Unique identifier of a resolution
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ResolutionId(Uuid);

impl ResolutionId {
    /// Generate a fresh identifier
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Parse an identifier received from a caller
    pub fn parse(id: &str) -> GovernanceResult<Self> {
        Uuid::parse_str(id.trim())
            .map(Self)
            .map_err(|_| GovernanceError::validation(format!("invalid resolution id '{}'", id)))
    }
}

impl Default for ResolutionId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for ResolutionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for ResolutionId {
    type Err = GovernanceError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

/// Ballot option
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum VoteOption {
    Yes,
    No,
    Abstain,
}

impl VoteOption {
    pub const ALL: [VoteOption; 3] = [VoteOption::Yes, VoteOption::No, VoteOption::Abstain];

    /// Parse a caller-supplied option. Accepts the Spanish labels used by
    /// existing clients (`Sí`, `No`, `Abstención`) alongside the English ones.
    pub fn parse(option: &str) -> GovernanceResult<Self> {
        match option.trim().to_lowercase().as_str() {
            "yes" | "sí" | "si" => Ok(VoteOption::Yes),
            "no" => Ok(VoteOption::No),
            "abstain" | "abstención" | "abstencion" => Ok(VoteOption::Abstain),
            _ => Err(GovernanceError::validation(format!(
                "invalid option '{}', expected Yes, No or Abstain",
                option
            ))),
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            VoteOption::Yes => "Yes",
            VoteOption::No => "No",
            VoteOption::Abstain => "Abstain",
        }
    }
}

impl fmt::Display for VoteOption {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for VoteOption {
    type Err = GovernanceError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

/// One recorded choice on a resolution
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Ballot {
    /// Member whose choice this record represents
    pub voter_id: MemberId,
    pub option: VoteOption,
    pub voted_at: DateTime<Utc>,
    /// Set on proxy ballots: the member who assigned this ballot
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub delegated_by: Option<MemberId>,
}

impl Ballot {
    pub fn direct(voter_id: MemberId, option: VoteOption, voted_at: DateTime<Utc>) -> Self {
        Self {
            voter_id,
            option,
            voted_at,
            delegated_by: None,
        }
    }

    pub fn proxy(delegate: MemberId, delegator: MemberId, option: VoteOption, voted_at: DateTime<Utc>) -> Self {
        Self {
            voter_id: delegate,
            option,
            voted_at,
            delegated_by: Some(delegator),
        }
    }

    pub fn is_proxy(&self) -> bool {
        self.delegated_by.is_some()
    }

    /// Slot this ballot occupies in a [`BallotBook`]
    pub fn key(&self) -> BallotKey {
        match &self.delegated_by {
            Some(delegator) => BallotKey::Proxy(delegator.clone()),
            None => BallotKey::Direct(self.voter_id.clone()),
        }
    }

    /// Set a new option and refresh the timestamp
    pub fn record(&mut self, option: VoteOption, at: DateTime<Utc>) {
        self.option = option;
        self.voted_at = at;
    }
}

/// A member has one direct slot and one delegation slot per resolution
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum BallotKey {
    /// The member's own ballot
    Direct(MemberId),
    /// The ballot the member has assigned to a proxy, whoever the proxy is
    Proxy(MemberId),
}

/// Ballots keyed by slot, iterated in insertion order
#[derive(Debug, Clone, Default)]
pub struct BallotBook {
    entries: BTreeMap<u64, Ballot>,
    index: HashMap<BallotKey, u64>,
    next_seq: u64,
}

impl BallotBook {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, key: &BallotKey) -> Option<&Ballot> {
        self.index.get(key).and_then(|seq| self.entries.get(seq))
    }

    pub fn get_mut(&mut self, key: &BallotKey) -> Option<&mut Ballot> {
        match self.index.get(key) {
            Some(seq) => self.entries.get_mut(seq),
            None => None,
        }
    }

    /// Append a ballot at the end of the order, replacing whatever held its slot
    pub fn insert(&mut self, ballot: Ballot) -> Option<Ballot> {
        let key = ballot.key();
        let previous = self.remove(&key);

        let seq = self.next_seq;
        self.next_seq += 1;
        self.entries.insert(seq, ballot);
        self.index.insert(key, seq);

        previous
    }

    pub fn remove(&mut self, key: &BallotKey) -> Option<Ballot> {
        let seq = self.index.remove(key)?;
        self.entries.remove(&seq)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Ballot> {
        self.entries.values()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl PartialEq for BallotBook {
    fn eq(&self, other: &Self) -> bool {
        self.len() == other.len() && self.iter().eq(other.iter())
    }
}

impl Eq for BallotBook {}

impl From<Vec<Ballot>> for BallotBook {
    fn from(ballots: Vec<Ballot>) -> Self {
        let mut book = BallotBook::new();
        for ballot in ballots {
            book.insert(ballot);
        }
        book
    }
}

impl From<BallotBook> for Vec<Ballot> {
    fn from(book: BallotBook) -> Self {
        book.entries.into_values().collect()
    }
}

impl Serialize for BallotBook {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_seq(self.iter())
    }
}

impl<'de> Deserialize<'de> for BallotBook {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        Vec::<Ballot>::deserialize(deserializer).map(BallotBook::from)
    }
}

/// A governance question open for voting during a fixed window
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Resolution {
    pub id: ResolutionId,
    pub title: String,
    #[serde(default)]
    pub details: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub proposer: Option<MemberId>,
    pub scope_id: ScopeId,
    pub created_at: DateTime<Utc>,
    pub duration_minutes: u32,
    #[serde(default)]
    pub ballots: BallotBook,
}
