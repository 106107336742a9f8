//! Ballot upsert
//!
//! A vote always records the caller's own ballot. Independently it reconciles
//! the single proxy ballot the caller may have assigned: kept and updated for
//! the same delegate, moved to a new delegate, or revoked when no delegate is
//! named.

use chrono::{DateTime, Utc};

use coopvote_common::MemberId;

use crate::{Ballot, BallotBook, BallotKey, VoteOption};

/// A validated vote
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VoteCommand {
    pub voter: MemberId,
    pub option: VoteOption,
    /// Already checked by the delegation resolver
    pub delegate_to: Option<MemberId>,
}

/// What happened to the caller's own ballot
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DirectChange {
    Inserted,
    Updated,
}

/// What happened to the caller's proxy ballot
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProxyChange {
    /// No delegation before or after
    Unchanged,
    Created,
    /// Same delegate, new option
    Updated,
    /// Delegation moved away from the given member
    Moved { from: MemberId },
    /// Delegation to the given member withdrawn
    Revoked { from: MemberId },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VoteEffect {
    pub direct: DirectChange,
    pub proxy: ProxyChange,
}

/// Apply `command` to `book` at `now`
pub fn apply_vote(book: &mut BallotBook, command: &VoteCommand, now: DateTime<Utc>) -> VoteEffect {
    let voter = &command.voter;

    let direct = match book.get_mut(&BallotKey::Direct(voter.clone())) {
        Some(ballot) => {
            ballot.record(command.option, now);
            DirectChange::Updated
        }
        None => {
            book.insert(Ballot::direct(voter.clone(), command.option, now));
            DirectChange::Inserted
        }
    };

    let proxy_key = BallotKey::Proxy(voter.clone());
    let current = book.get(&proxy_key).map(|b| b.voter_id.clone());

    let proxy = match (&command.delegate_to, current) {
        (Some(delegate), Some(current)) if *delegate == current => {
            if let Some(ballot) = book.get_mut(&proxy_key) {
                ballot.record(command.option, now);
            }
            ProxyChange::Updated
        }
        (Some(delegate), current) => {
            book.insert(Ballot::proxy(delegate.clone(), voter.clone(), command.option, now));
            match current {
                Some(from) => ProxyChange::Moved { from },
                None => ProxyChange::Created,
            }
        }
        (None, Some(from)) => {
            book.remove(&proxy_key);
            ProxyChange::Revoked { from }
        }
        (None, None) => ProxyChange::Unchanged,
    };

    VoteEffect { direct, proxy }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Tally;
    use chrono::Duration;

    fn member(id: &str) -> MemberId {
        MemberId::parse(id).unwrap()
    }

    fn vote(voter: &str, option: VoteOption, delegate_to: Option<&str>) -> VoteCommand {
        VoteCommand {
            voter: member(voter),
            option,
            delegate_to: delegate_to.map(member),
        }
    }

    fn direct_ballots_of(book: &BallotBook, voter: &str) -> usize {
        book.iter()
            .filter(|b| b.voter_id.as_str() == voter && !b.is_proxy())
            .count()
    }

    #[test]
    fn test_repeated_direct_votes_update_in_place() {
        let t0 = Utc::now();
        let mut book = BallotBook::new();

        let first = apply_vote(&mut book, &vote("a", VoteOption::Yes, None), t0);
        assert_eq!(first.direct, DirectChange::Inserted);

        for option in [VoteOption::No, VoteOption::Abstain, VoteOption::Yes] {
            let effect = apply_vote(&mut book, &vote("a", option, None), t0 + Duration::seconds(5));
            assert_eq!(effect.direct, DirectChange::Updated);
            assert_eq!(effect.proxy, ProxyChange::Unchanged);
        }

        assert_eq!(book.len(), 1);
        assert_eq!(direct_ballots_of(&book, "a"), 1);
        let ballot = book.get(&BallotKey::Direct(member("a"))).unwrap();
        assert_eq!(ballot.option, VoteOption::Yes);
        assert_eq!(ballot.voted_at, t0 + Duration::seconds(5));
    }

    #[test]
    fn test_redelegation_moves_the_proxy_ballot() {
        let now = Utc::now();
        let mut book = BallotBook::new();

        let effect = apply_vote(&mut book, &vote("b", VoteOption::No, Some("c")), now);
        assert_eq!(effect.proxy, ProxyChange::Created);

        let effect = apply_vote(&mut book, &vote("b", VoteOption::No, Some("d")), now);
        assert_eq!(effect.proxy, ProxyChange::Moved { from: member("c") });

        let proxies: Vec<&Ballot> = book.iter().filter(|b| b.is_proxy()).collect();
        assert_eq!(proxies.len(), 1);
        assert_eq!(proxies[0].voter_id, member("d"));
        assert_eq!(proxies[0].delegated_by, Some(member("b")));
    }

    #[test]
    fn test_same_delegate_updates_option() {
        let now = Utc::now();
        let mut book = BallotBook::new();

        apply_vote(&mut book, &vote("b", VoteOption::No, Some("c")), now);
        let effect = apply_vote(&mut book, &vote("b", VoteOption::Yes, Some("c")), now);

        assert_eq!(effect.proxy, ProxyChange::Updated);
        assert_eq!(book.len(), 2);
        assert_eq!(
            book.get(&BallotKey::Proxy(member("b"))).unwrap().option,
            VoteOption::Yes
        );
    }

    #[test]
    fn test_revocation_removes_proxy_ballot() {
        let now = Utc::now();
        let mut book = BallotBook::new();

        apply_vote(&mut book, &vote("b", VoteOption::No, Some("c")), now);
        let before = Tally::of(&book);

        let effect = apply_vote(&mut book, &vote("b", VoteOption::No, None), now);
        assert_eq!(effect.proxy, ProxyChange::Revoked { from: member("c") });

        let after = Tally::of(&book);
        assert!(book.get(&BallotKey::Proxy(member("b"))).is_none());
        assert_eq!(after.no, before.no - 1);
        assert_eq!(after.total(), book.len());
    }

    #[test]
    fn test_delegate_keeps_own_direct_ballot() {
        let now = Utc::now();
        let mut book = BallotBook::new();

        apply_vote(&mut book, &vote("c", VoteOption::Yes, None), now);
        apply_vote(&mut book, &vote("b", VoteOption::No, Some("c")), now);

        assert_eq!(direct_ballots_of(&book, "c"), 1);
        assert_eq!(book.iter().filter(|b| b.voter_id == member("c")).count(), 2);
    }
}
