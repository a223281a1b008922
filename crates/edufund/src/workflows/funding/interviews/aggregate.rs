use serde::{Deserialize, Serialize};

use super::domain::{Decision, InterviewDecision};

/// Panel verdict derived from the recorded votes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum InterviewOutcome {
    Approve,
    Reject,
    Inconclusive,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct VoteTally {
    pub approve: usize,
    pub reject: usize,
    pub abstain: usize,
}

impl VoteTally {
    /// Votes that count toward a majority.
    pub fn decisive(&self) -> usize {
        self.approve + self.reject
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct OutcomeSummary {
    pub outcome: InterviewOutcome,
    pub tally: VoteTally,
}

/// Strict majority of non-abstaining votes; ties and empty panels are inconclusive.
pub fn aggregate(decisions: &[InterviewDecision]) -> OutcomeSummary {
    let tally = decisions
        .iter()
        .fold(VoteTally::default(), |mut tally, entry| {
            match entry.decision {
                Decision::Approve => tally.approve += 1,
                Decision::Reject => tally.reject += 1,
                Decision::Abstain => tally.abstain += 1,
            }
            tally
        });

    let decisive = tally.decisive();
    let outcome = if tally.approve * 2 > decisive {
        InterviewOutcome::Approve
    } else if tally.reject * 2 > decisive {
        InterviewOutcome::Reject
    } else {
        InterviewOutcome::Inconclusive
    };

    OutcomeSummary { outcome, tally }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::workflows::funding::domain::{InterviewId, PanelMemberId};
    use chrono::Utc;

    fn votes(decisions: &[Decision]) -> Vec<InterviewDecision> {
        decisions
            .iter()
            .enumerate()
            .map(|(index, decision)| InterviewDecision {
                interview_id: InterviewId::new("int-000001"),
                panel_member_id: PanelMemberId::new(format!("panel-{index}")),
                decision: *decision,
                comment: None,
                recorded_at: Utc::now(),
            })
            .collect()
    }

    #[test]
    fn two_approvals_outvote_one_rejection() {
        let summary = aggregate(&votes(&[Decision::Approve, Decision::Approve, Decision::Reject]));
        assert_eq!(summary.outcome, InterviewOutcome::Approve);
        assert_eq!(summary.tally.approve, 2);
        assert_eq!(summary.tally.reject, 1);
    }

    #[test]
    fn abstentions_do_not_count_toward_majority() {
        let summary = aggregate(&votes(&[Decision::Reject, Decision::Abstain, Decision::Abstain]));
        assert_eq!(summary.outcome, InterviewOutcome::Reject);
        assert_eq!(summary.tally.abstain, 2);
    }

    #[test]
    fn ties_and_empty_panels_are_inconclusive() {
        assert_eq!(
            aggregate(&votes(&[Decision::Approve, Decision::Reject])).outcome,
            InterviewOutcome::Inconclusive
        );
        assert_eq!(aggregate(&[]).outcome, InterviewOutcome::Inconclusive);
        assert_eq!(
            aggregate(&votes(&[Decision::Abstain])).outcome,
            InterviewOutcome::Inconclusive
        );
    }
}
