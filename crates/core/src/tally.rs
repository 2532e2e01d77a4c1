//! Community-vote acceptance policy for pending edits.
//!
//! [`tally`] is pure decision logic: given the edit's age, the content
//! piece's author count, and the recorded votes, it returns a [`Verdict`].
//! Scheduling of when to tally belongs to the engine crate; this module has
//! no side effects and no suspension points.

use serde::{Deserialize, Serialize};

use crate::edit::{Vote, VoteChoice};
use crate::types::Timestamp;

// ---------------------------------------------------------------------------
// Policy constants
// ---------------------------------------------------------------------------

/// After this many days an edit is force-resolved: accepted on a simple
/// majority, rejected otherwise.
pub const DECISION_DEADLINE_DAYS: i64 = 10;

/// Minimum age in days before the early supermajority rule applies.
pub const EARLY_DECISION_MIN_AGE_DAYS: i64 = 5;

/// Minimum number of votes for the early supermajority rule.
pub const EARLY_DECISION_MIN_VOTES: usize = 2;

/// Simple majority threshold.
pub const SIMPLE_MAJORITY_RATIO: f64 = 0.50;

/// Approval ratio for the early supermajority rule.
pub const EARLY_DECISION_RATIO: f64 = 0.66;

/// Approval ratio when only half the authors have voted.
pub const HALF_QUORUM_SUPERMAJORITY_RATIO: f64 = 0.75;

// ---------------------------------------------------------------------------
// Verdict
// ---------------------------------------------------------------------------

/// The outcome of tallying a pending edit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Verdict {
    /// The edit is accepted; finalize it.
    Accept,
    /// The edit is rejected; finalize it.
    Reject,
    /// No decision yet; keep the edit open.
    Continue,
}

impl Verdict {
    /// Whether this verdict ends the edit's pending lifetime.
    pub fn is_terminal(&self) -> bool {
        !matches!(self, Self::Continue)
    }

    /// String representation for display, logging, and notifications.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Accept => "accept",
            Self::Reject => "reject",
            Self::Continue => "continue",
        }
    }
}

impl std::fmt::Display for Verdict {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// Tally
// ---------------------------------------------------------------------------

/// Evaluate the acceptance policy for a pending edit.
///
/// `author_count` is the number of distinct credited authors of the content
/// piece at tally time, supplied fresh by the caller on every invocation (it
/// may change between tallies; staleness is tolerated, not corrected).
///
/// Decision order, first match wins:
/// 1. No votes yet: accept when there is nobody to object (zero authors) or
///    the deadline has passed; otherwise keep waiting.
/// 2. Accept on unanimous participation with a simple majority, on a
///    three-quarters approval with half the authors voting, on a two-thirds
///    approval after five days with at least two votes, or on a simple
///    majority once the deadline has passed.
/// 3. Reject when half the authors voted against, or the deadline has
///    passed without an accepting majority.
/// 4. Otherwise keep waiting.
pub fn tally(created_at: Timestamp, votes: &[Vote], author_count: i64, now: Timestamp) -> Verdict {
    let age_days = (now - created_at).num_days();
    let vote_count = votes.len();
    let for_count = votes
        .iter()
        .filter(|v| v.choice == VoteChoice::For)
        .count();
    let against_count = vote_count - for_count;

    // No votes: the ratio rules below would divide by zero, so this case is
    // decided first.
    if vote_count == 0 {
        return if author_count == 0 || age_days >= DECISION_DEADLINE_DAYS {
            Verdict::Accept
        } else {
            Verdict::Continue
        };
    }

    let for_ratio = for_count as f64 / vote_count as f64;
    let half_authors = author_count as f64 / 2.0;

    let unanimous_participation =
        vote_count as i64 == author_count && for_ratio >= SIMPLE_MAJORITY_RATIO;
    let half_quorum_supermajority =
        vote_count as f64 >= half_authors && for_ratio >= HALF_QUORUM_SUPERMAJORITY_RATIO;
    let early_supermajority = age_days >= EARLY_DECISION_MIN_AGE_DAYS
        && vote_count >= EARLY_DECISION_MIN_VOTES
        && for_ratio >= EARLY_DECISION_RATIO;
    let deadline_majority =
        age_days >= DECISION_DEADLINE_DAYS && for_ratio >= SIMPLE_MAJORITY_RATIO;

    if unanimous_participation || half_quorum_supermajority || early_supermajority || deadline_majority
    {
        return Verdict::Accept;
    }

    if against_count as f64 >= half_authors || age_days >= DECISION_DEADLINE_DAYS {
        return Verdict::Reject;
    }

    Verdict::Continue
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::edit::Vote;
    use chrono::{Duration, Utc};

    fn vote(voter_id: i64, choice: VoteChoice) -> Vote {
        Vote {
            voter_id,
            choice,
            cast_at: Utc::now(),
        }
    }

    fn aged(days: i64) -> (Timestamp, Timestamp) {
        let now = Utc::now();
        (now - Duration::days(days), now)
    }

    // -- Rule 1: no votes ----------------------------------------------------

    #[test]
    fn no_votes_no_authors_accepts_immediately() {
        let (created, now) = aged(0);
        assert_eq!(tally(created, &[], 0, now), Verdict::Accept);
    }

    #[test]
    fn no_votes_with_authors_continues() {
        let (created, now) = aged(3);
        assert_eq!(tally(created, &[], 3, now), Verdict::Continue);
    }

    #[test]
    fn no_votes_past_deadline_accepts() {
        let (created, now) = aged(10);
        assert_eq!(tally(created, &[], 3, now), Verdict::Accept);
    }

    // -- Rule 2: acceptance --------------------------------------------------

    #[test]
    fn unanimous_participation_simple_majority_accepts() {
        let (created, now) = aged(1);
        let votes = vec![vote(1, VoteChoice::For), vote(2, VoteChoice::For)];
        assert_eq!(tally(created, &votes, 2, now), Verdict::Accept);
    }

    #[test]
    fn unanimous_participation_split_vote_accepts() {
        // Half for, half against, everyone voted: 0.5 >= 0.5.
        let (created, now) = aged(1);
        let votes = vec![vote(1, VoteChoice::For), vote(2, VoteChoice::Against)];
        assert_eq!(tally(created, &votes, 2, now), Verdict::Accept);
    }

    #[test]
    fn half_quorum_supermajority_accepts() {
        // 4 of 8 authors voted, 3 for out of 4 = 0.75.
        let (created, now) = aged(1);
        let votes = vec![
            vote(1, VoteChoice::For),
            vote(2, VoteChoice::For),
            vote(3, VoteChoice::For),
            vote(4, VoteChoice::Against),
        ];
        assert_eq!(tally(created, &votes, 8, now), Verdict::Accept);
    }

    #[test]
    fn early_supermajority_needs_age_and_votes() {
        // 2 of 6 authors voted, both for. Too young on day 4.
        let votes = vec![vote(1, VoteChoice::For), vote(2, VoteChoice::For)];
        let (created, now) = aged(4);
        assert_eq!(tally(created, &votes, 6, now), Verdict::Continue);

        let (created, now) = aged(5);
        assert_eq!(tally(created, &votes, 6, now), Verdict::Accept);
    }

    #[test]
    fn single_vote_is_not_an_early_supermajority() {
        let votes = vec![vote(1, VoteChoice::For)];
        let (created, now) = aged(6);
        assert_eq!(tally(created, &votes, 6, now), Verdict::Continue);
    }

    #[test]
    fn deadline_simple_majority_accepts() {
        // 1 for, 1 against out of 5 authors on day 10: ratio 0.5.
        let votes = vec![vote(1, VoteChoice::For), vote(2, VoteChoice::Against)];
        let (created, now) = aged(10);
        assert_eq!(tally(created, &votes, 5, now), Verdict::Accept);
    }

    // -- Rule 3: rejection ---------------------------------------------------

    #[test]
    fn half_authors_against_rejects() {
        let votes = vec![vote(1, VoteChoice::Against)];
        let (created, now) = aged(1);
        assert_eq!(tally(created, &votes, 2, now), Verdict::Reject);
    }

    #[test]
    fn deadline_without_majority_rejects() {
        // Sole vote against, 2 authors, day 11: for-ratio 0 fails every
        // acceptance rule, deadline forces rejection.
        let votes = vec![vote(1, VoteChoice::Against)];
        let (created, now) = aged(11);
        assert_eq!(tally(created, &votes, 2, now), Verdict::Reject);
    }

    // -- Rule 4: continue ----------------------------------------------------

    #[test]
    fn minority_opposition_continues() {
        // 1 against out of 5 authors, young edit: not enough to reject.
        let votes = vec![vote(1, VoteChoice::Against)];
        let (created, now) = aged(2);
        assert_eq!(tally(created, &votes, 5, now), Verdict::Continue);
    }

    #[test]
    fn low_ratio_young_edit_continues() {
        // 1 for, 1 against out of 6 authors on day 2: no rule fires.
        let votes = vec![vote(1, VoteChoice::For), vote(2, VoteChoice::Against)];
        let (created, now) = aged(2);
        assert_eq!(tally(created, &votes, 6, now), Verdict::Continue);
    }

    // -- Verdict -------------------------------------------------------------

    #[test]
    fn terminal_verdicts() {
        assert!(Verdict::Accept.is_terminal());
        assert!(Verdict::Reject.is_terminal());
        assert!(!Verdict::Continue.is_terminal());
    }

    #[test]
    fn verdict_display_matches_as_str() {
        assert_eq!(Verdict::Accept.to_string(), "accept");
        assert_eq!(Verdict::Reject.to_string(), "reject");
        assert_eq!(Verdict::Continue.to_string(), "continue");
    }
}
