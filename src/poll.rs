//! View-ready poll and vote records.

use crate::clarity::{decode::select_fields, ClarityValue, DecodeError};
use serde::{Deserialize, Serialize};

/// Tuple fields of a poll record as stored by the contract.
pub const POLL_FIELDS: [&str; 7] = [
    "creator",
    "title",
    "description",
    "yes-votes",
    "no-votes",
    "end-block",
    "is-active",
];

pub const MAX_TITLE_LEN: usize = 256;
pub const MAX_DESCRIPTION_LEN: usize = 1024;

/// A poll as returned by `get-poll`.
///
/// Counters and heights are `u128`, the full Clarity uint range. JSON
/// consumers in JavaScript lose precision above 2^53.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Poll {
    pub poll_id: u128,
    pub creator: String,
    pub title: String,
    pub description: String,
    pub yes_votes: u128,
    pub no_votes: u128,
    pub end_block: u128,
    pub is_active: bool,
}

impl Poll {
    /// Build a poll from a `get-poll` result.
    ///
    /// Accepts `(ok ...)`, `(some ...)` or a bare tuple. `none` means the id
    /// does not exist and yields `Ok(None)`.
    pub fn from_clarity(poll_id: u128, value: ClarityValue) -> Result<Option<Poll>, DecodeError> {
        let fields = match value.unwrap_ok().into_optional() {
            None => return Ok(None),
            Some(ClarityValue::Tuple(fields)) => select_fields(fields, &POLL_FIELDS)?,
            Some(other) => return Err(DecodeError::mismatch(0, "tuple", &other)),
        };

        let uint = |name: &str| -> Result<u128, DecodeError> {
            let v = &fields[name];
            v.as_uint().ok_or_else(|| DecodeError::mismatch(0, "uint", v))
        };
        let text = |name: &str| -> Result<String, DecodeError> {
            let v = &fields[name];
            v.as_str()
                .map(str::to_string)
                .ok_or_else(|| DecodeError::mismatch(0, "string-ascii", v))
        };

        let creator = fields["creator"]
            .as_principal()
            .map(|p| p.to_string())
            .ok_or_else(|| DecodeError::mismatch(0, "principal", &fields["creator"]))?;
        let is_active = fields["is-active"]
            .as_bool()
            .ok_or_else(|| DecodeError::mismatch(0, "bool", &fields["is-active"]))?;

        Ok(Some(Poll {
            poll_id,
            creator,
            title: text("title")?,
            description: text("description")?,
            yes_votes: uint("yes-votes")?,
            no_votes: uint("no-votes")?,
            end_block: uint("end-block")?,
            is_active,
        }))
    }

    pub fn total_votes(&self) -> u128 {
        self.yes_votes.saturating_add(self.no_votes)
    }

    /// Whether the poll still accepts votes at `height`. The contract is the
    /// authority; this mirrors its rule for display.
    pub fn is_open_at(&self, height: u128) -> bool {
        self.is_active && height < self.end_block
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VoteChoice {
    Yes,
    No,
}

impl From<bool> for VoteChoice {
    fn from(yes: bool) -> Self {
        if yes {
            VoteChoice::Yes
        } else {
            VoteChoice::No
        }
    }
}

impl VoteChoice {
    pub fn as_bool(self) -> bool {
        matches!(self, VoteChoice::Yes)
    }
}

/// One successful vote transaction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VoterRecord {
    pub address: String,
    pub vote: VoteChoice,
    /// Burn block time, seconds since epoch.
    pub timestamp: u64,
    pub tx_id: String,
}

/// Voter roster for a single poll, newest first.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PollVoters {
    pub poll_id: u128,
    pub voters: Vec<VoterRecord>,
    pub total_voters: usize,
    pub yes_votes: usize,
    pub no_votes: usize,
}

impl PollVoters {
    /// Sorts `voters` by timestamp descending and folds the tallies.
    pub fn from_records(poll_id: u128, mut voters: Vec<VoterRecord>) -> Self {
        voters.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));
        let (yes_votes, no_votes) = voters.iter().fold((0, 0), |(y, n), v| match v.vote {
            VoteChoice::Yes => (y + 1, n),
            VoteChoice::No => (y, n + 1),
        });
        Self {
            poll_id,
            total_voters: voters.len(),
            voters,
            yes_votes,
            no_votes,
        }
    }
}

/// In-band marker for a poll that could not be fetched or decoded.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PollFetchFailure {
    pub poll_id: u128,
    pub reason: String,
}

/// Result of a catalog sync. `polls` is ordered newest (highest id) first.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PollCatalog {
    pub count: u128,
    pub polls: Vec<Poll>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub failures: Vec<PollFetchFailure>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clarity::Principal;
    use std::collections::BTreeMap;

    fn poll_tuple(title: &str, yes: u128, no: u128, active: bool) -> ClarityValue {
        let mut fields = BTreeMap::new();
        fields.insert(
            "creator".to_string(),
            ClarityValue::Principal(Principal::standard(22, [1u8; 20])),
        );
        fields.insert("title".to_string(), ClarityValue::StringAscii(title.into()));
        fields.insert(
            "description".to_string(),
            ClarityValue::StringAscii("desc".into()),
        );
        fields.insert("yes-votes".to_string(), ClarityValue::UInt(yes));
        fields.insert("no-votes".to_string(), ClarityValue::UInt(no));
        fields.insert("end-block".to_string(), ClarityValue::UInt(900));
        fields.insert("is-active".to_string(), ClarityValue::Bool(active));
        ClarityValue::Tuple(fields)
    }

    #[test]
    fn test_from_some_tuple() {
        let value = ClarityValue::OptionalSome(Box::new(poll_tuple("Lunch?", 3, 1, true)));
        let poll = Poll::from_clarity(4, value).unwrap().unwrap();
        assert_eq!(poll.poll_id, 4);
        assert_eq!(poll.title, "Lunch?");
        assert_eq!(poll.total_votes(), 4);
        assert!(poll.creator.starts_with("SP"));
        assert!(poll.is_open_at(899));
        assert!(!poll.is_open_at(900));
    }

    #[test]
    fn test_none_is_absent_not_error() {
        assert_eq!(Poll::from_clarity(9, ClarityValue::OptionalNone).unwrap(), None);
    }

    #[test]
    fn test_wrong_field_type() {
        let mut value = poll_tuple("x", 0, 0, true);
        if let ClarityValue::Tuple(fields) = &mut value {
            fields.insert("yes-votes".to_string(), ClarityValue::Bool(true));
        }
        assert!(Poll::from_clarity(0, value).is_err());
    }

    #[test]
    fn test_voters_sorted_and_tallied() {
        let rec = |ts, vote| VoterRecord {
            address: "SP1".into(),
            vote,
            timestamp: ts,
            tx_id: format!("0x{ts}"),
        };
        let voters = PollVoters::from_records(
            1,
            vec![
                rec(10, VoteChoice::Yes),
                rec(30, VoteChoice::No),
                rec(20, VoteChoice::Yes),
            ],
        );
        let ts: Vec<u64> = voters.voters.iter().map(|v| v.timestamp).collect();
        assert_eq!(ts, vec![30, 20, 10]);
        assert_eq!((voters.total_voters, voters.yes_votes, voters.no_votes), (3, 2, 1));
    }

    #[test]
    fn test_poll_json_shape() {
        let poll = Poll::from_clarity(0, poll_tuple("t", 1, 2, false))
            .unwrap()
            .unwrap();
        let json = serde_json::to_value(&poll).unwrap();
        assert_eq!(json["pollId"], 0);
        assert_eq!(json["yesVotes"], 1);
        assert_eq!(json["isActive"], false);
    }
}
