//! Permission table for application status changes.
//!
//! Every legal edge is listed once per set of roles that may take it, together with the
//! advisory record (field review or interview aggregate) that has to back the move. The
//! table is pure data so it can be audited and tested without a store.

use serde::Serialize;

use super::domain::ApplicationStatus;
use crate::workflows::funding::domain::ActorRole;
use crate::workflows::funding::interviews::InterviewOutcome;
use crate::workflows::funding::verification::FieldRecommendation;

use ActorRole::{Administrator, Board, Donor, FieldVerifier, Student};
use ApplicationStatus::{
    Approved, CaseWorkerApproved, Draft, InterviewStage, Pending, Rejected, Sponsored, Withdrawn,
};

/// Advisory precondition attached to an edge.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Guard {
    None,
    FieldRecommends,
    FieldDeclines,
    InterviewApproves,
    InterviewRejects,
    SponsorshipCompleted,
}

impl Guard {
    pub const fn requirement(self) -> &'static str {
        match self {
            Guard::None => "none",
            Guard::FieldRecommends => "a completed field review recommending the student",
            Guard::FieldDeclines => "a completed field review declining the student",
            Guard::InterviewApproves => "an interview panel majority to approve",
            Guard::InterviewRejects => "an interview panel majority to reject",
            Guard::SponsorshipCompleted => "a sponsorship with every installment paid",
        }
    }

    fn satisfied_by(self, advisory: &AdvisoryContext) -> bool {
        match self {
            Guard::None => true,
            Guard::FieldRecommends => advisory
                .field_recommendation
                .map_or(false, FieldRecommendation::clears_verification),
            Guard::FieldDeclines => {
                advisory.field_recommendation == Some(FieldRecommendation::DoNotRecommend)
            }
            Guard::InterviewApproves => advisory.interview_outcome == Some(InterviewOutcome::Approve),
            Guard::InterviewRejects => advisory.interview_outcome == Some(InterviewOutcome::Reject),
            Guard::SponsorshipCompleted => advisory.sponsorship_completed,
        }
    }
}

/// One permitted status change.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Edge {
    pub from: ApplicationStatus,
    pub to: ApplicationStatus,
    pub roles: &'static [ActorRole],
    pub guard: Guard,
}

const fn edge(
    from: ApplicationStatus,
    to: ApplicationStatus,
    roles: &'static [ActorRole],
    guard: Guard,
) -> Edge {
    Edge {
        from,
        to,
        roles,
        guard,
    }
}

pub const EDGES: &[Edge] = &[
    edge(Draft, Pending, &[Student], Guard::None),
    edge(
        Pending,
        CaseWorkerApproved,
        &[FieldVerifier, Administrator],
        Guard::FieldRecommends,
    ),
    edge(Pending, Rejected, &[FieldVerifier], Guard::FieldDeclines),
    edge(Pending, Rejected, &[Administrator], Guard::None),
    // REQUEST_INFO: back to the holding state, review data stays attached.
    edge(
        CaseWorkerApproved,
        Pending,
        &[FieldVerifier, Administrator],
        Guard::None,
    ),
    edge(
        CaseWorkerApproved,
        InterviewStage,
        &[Administrator, Board],
        Guard::None,
    ),
    edge(CaseWorkerApproved, Approved, &[Administrator], Guard::None),
    edge(CaseWorkerApproved, Rejected, &[Administrator], Guard::None),
    edge(
        InterviewStage,
        Approved,
        &[Board, Administrator],
        Guard::InterviewApproves,
    ),
    edge(InterviewStage, Rejected, &[Board], Guard::InterviewRejects),
    edge(InterviewStage, Rejected, &[Administrator], Guard::None),
    // Only reachable once the payments side has settled the whole plan.
    edge(
        Approved,
        Sponsored,
        &[Donor, Administrator],
        Guard::SponsorshipCompleted,
    ),
    edge(Draft, Withdrawn, &[Student], Guard::None),
    edge(Pending, Withdrawn, &[Student], Guard::None),
    edge(CaseWorkerApproved, Withdrawn, &[Student], Guard::None),
    edge(InterviewStage, Withdrawn, &[Student], Guard::None),
];

/// Advisory records consulted by guarded edges.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct AdvisoryContext {
    pub field_recommendation: Option<FieldRecommendation>,
    pub interview_outcome: Option<InterviewOutcome>,
    pub sponsorship_completed: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransitionRejection {
    UndefinedEdge {
        from: ApplicationStatus,
        to: ApplicationStatus,
    },
    RoleNotPermitted {
        from: ApplicationStatus,
        to: ApplicationStatus,
        role: ActorRole,
    },
    AdvisoryMissing {
        from: ApplicationStatus,
        to: ApplicationStatus,
        requirement: &'static str,
    },
}

/// Resolve the edge a role may take from `from` to `to` given the advisory records.
pub fn authorize(
    from: ApplicationStatus,
    to: ApplicationStatus,
    role: ActorRole,
    advisory: &AdvisoryContext,
) -> Result<&'static Edge, TransitionRejection> {
    let mut candidates = EDGES
        .iter()
        .filter(|edge| edge.from == from && edge.to == to)
        .peekable();
    if candidates.peek().is_none() {
        return Err(TransitionRejection::UndefinedEdge { from, to });
    }

    let permitted: Vec<&'static Edge> = candidates
        .filter(|edge| edge.roles.contains(&role))
        .collect();
    let Some(first) = permitted.first() else {
        return Err(TransitionRejection::RoleNotPermitted { from, to, role });
    };

    permitted
        .iter()
        .copied()
        .find(|edge| edge.guard.satisfied_by(advisory))
        .ok_or(TransitionRejection::AdvisoryMissing {
            from,
            to,
            requirement: first.guard.requirement(),
        })
}

/// Whether any role can ever move an application between the two statuses.
pub fn is_edge(from: ApplicationStatus, to: ApplicationStatus) -> bool {
    EDGES.iter().any(|edge| edge.from == from && edge.to == to)
}

/// Statuses reachable in one step, in table order and without duplicates.
pub fn targets_from(from: ApplicationStatus) -> Vec<ApplicationStatus> {
    let mut targets = Vec::new();
    for edge in EDGES.iter().filter(|edge| edge.from == from) {
        if !targets.contains(&edge.to) {
            targets.push(edge.to);
        }
    }
    targets
}
