//! Vote counts and per-member detail

use std::collections::HashMap;

use serde::{Serialize, Serializer};

use coopvote_common::MemberId;
use coopvote_identity::Member;

use crate::{Ballot, BallotBook, Resolution, VoteOption};

/// Reported for members without a ballot
pub const NO_VOTE: &str = "NO VOTO";

/// Ballot counts per option
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct Tally {
    #[serde(rename = "Yes")]
    pub yes: usize,
    #[serde(rename = "No")]
    pub no: usize,
    #[serde(rename = "Abstain")]
    pub abstain: usize,
}

impl Tally {
    /// Count every ballot, direct and proxy alike
    pub fn of(book: &BallotBook) -> Self {
        book.iter().fold(Tally::default(), |mut tally, ballot| {
            match ballot.option {
                VoteOption::Yes => tally.yes += 1,
                VoteOption::No => tally.no += 1,
                VoteOption::Abstain => tally.abstain += 1,
            }
            tally
        })
    }

    pub fn count(&self, option: VoteOption) -> usize {
        match option {
            VoteOption::Yes => self.yes,
            VoteOption::No => self.no,
            VoteOption::Abstain => self.abstain,
        }
    }

    pub fn total(&self) -> usize {
        self.yes + self.no + self.abstain
    }
}

/// Option shown in the detail view
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DetailOption {
    Voted(VoteOption),
    NoVote,
}

impl Serialize for DetailOption {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            DetailOption::Voted(option) => serializer.serialize_str(option.as_str()),
            DetailOption::NoVote => serializer.serialize_str(NO_VOTE),
        }
    }
}

/// One row of the ballot detail
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DetailEntry {
    pub member_id: MemberId,
    pub member_name: String,
    pub option: DetailOption,
    /// Display name of the delegator when the ballot is a proxy ballot
    #[serde(skip_serializing_if = "Option::is_none")]
    pub represented_by_name: Option<String>,
}

/// Build the detail view for `eligible` members, in the order given.
///
/// `roster` is the full membership of the scope and is only used to name
/// delegators. When a member holds more than one ballot the most recently
/// recorded one is shown.
pub fn detail(resolution: &Resolution, eligible: &[Member], roster: &[Member]) -> Vec<DetailEntry> {
    let mut latest: HashMap<&MemberId, &Ballot> = HashMap::new();
    for ballot in resolution.ballots.iter() {
        latest.insert(&ballot.voter_id, ballot);
    }

    let names: HashMap<&MemberId, String> = roster.iter().map(|m| (&m.id, m.display_name())).collect();

    eligible
        .iter()
        .map(|member| {
            let (option, represented_by_name) = match latest.get(&member.id) {
                Some(ballot) => (
                    DetailOption::Voted(ballot.option),
                    ballot
                        .delegated_by
                        .as_ref()
                        .map(|delegator| names.get(delegator).cloned().unwrap_or_default()),
                ),
                None => (DetailOption::NoVote, None),
            };

            DetailEntry {
                member_id: member.id.clone(),
                member_name: member.display_name(),
                option,
                represented_by_name,
            }
        })
        .collect()
}
