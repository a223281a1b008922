//! Random walks over the permission table.

use edufund::workflows::funding::applications::lifecycle::{authorize, is_edge};
use edufund::workflows::funding::applications::{AdvisoryContext, ApplicationStatus};
use edufund::workflows::funding::interviews::InterviewOutcome;
use edufund::workflows::funding::verification::FieldRecommendation;
use edufund::workflows::funding::ActorRole;
use proptest::prelude::*;

const ROLES: [ActorRole; 5] = [
    ActorRole::Student,
    ActorRole::FieldVerifier,
    ActorRole::Board,
    ActorRole::Administrator,
    ActorRole::Donor,
];

fn arb_attempt() -> impl Strategy<Value = (ApplicationStatus, ActorRole)> {
    (
        prop::sample::select(ApplicationStatus::ALL.to_vec()),
        prop::sample::select(ROLES.to_vec()),
    )
}

fn arb_advisory() -> impl Strategy<Value = AdvisoryContext> {
    (
        prop::option::of(prop::sample::select(vec![
            FieldRecommendation::Recommend,
            FieldRecommendation::Conditional,
            FieldRecommendation::DoNotRecommend,
        ])),
        prop::option::of(prop::sample::select(vec![
            InterviewOutcome::Approve,
            InterviewOutcome::Reject,
            InterviewOutcome::Inconclusive,
        ])),
        any::<bool>(),
    )
        .prop_map(
            |(field_recommendation, interview_outcome, sponsorship_completed)| AdvisoryContext {
                field_recommendation,
                interview_outcome,
                sponsorship_completed,
            },
        )
}

proptest! {
    #[test]
    fn accepted_moves_always_follow_a_table_edge(
        attempts in prop::collection::vec(arb_attempt(), 1..40),
        advisory in arb_advisory(),
    ) {
        let mut path = vec![ApplicationStatus::Draft];
        let mut current = ApplicationStatus::Draft;

        for (target, role) in attempts {
            if let Ok(edge) = authorize(current, target, role, &advisory) {
                prop_assert_eq!(edge.from, current);
                prop_assert_eq!(edge.to, target);
                prop_assert!(edge.roles.contains(&role));
                current = target;
                path.push(current);
            }
        }

        prop_assert!(path.windows(2).all(|step| is_edge(step[0], step[1])));
        if let Some(position) = path.iter().position(|status| status.is_terminal()) {
            prop_assert_eq!(position, path.len() - 1, "left a terminal status: {:?}", path);
        }
    }
}

#[test]
fn terminal_statuses_have_no_way_out() {
    for terminal in [
        ApplicationStatus::Rejected,
        ApplicationStatus::Withdrawn,
        ApplicationStatus::Sponsored,
    ] {
        for target in ApplicationStatus::ALL {
            assert!(!is_edge(terminal, target), "{terminal} -> {target}");
        }
    }
}
