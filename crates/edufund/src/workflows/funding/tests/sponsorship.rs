use chrono::Utc;

use super::common::*;
use crate::workflows::funding::applications::{
    ApplicationError, ApplicationStatus, TransitionRequest,
};
use crate::workflows::funding::domain::{Actor, DonorId, IntentId};
use crate::workflows::funding::payments::{Cadence, PlanError};
use crate::workflows::funding::repository::Audience;
use crate::workflows::funding::sponsorship::{
    ClaimRequest, PoolListing, SettledInstallment, SponsorshipError, SponsorshipStatus,
};

fn claim(student_suffix: &str, donor: &str, amount: u64, cadence: Cadence) -> ClaimRequest {
    ClaimRequest {
        student_id: student(student_suffix),
        donor_id: DonorId::new(donor),
        amount,
        cadence,
    }
}

#[test]
fn claim_binds_the_donor_and_removes_the_listing() {
    let fixture = fixture();
    let record = approved(&fixture, &student("claimed"), 1_000);

    let sponsorship = fixture
        .services
        .sponsorships
        .claim(claim("claimed", "don-1", 1_000, Cadence::Monthly))
        .expect("claimed");

    assert_eq!(sponsorship.status, SponsorshipStatus::AwaitingPayment);
    assert_eq!(sponsorship.application_id, record.application_id);
    assert_eq!(sponsorship.currency, "PKR");
    assert!(fixture
        .services
        .sponsorships
        .pool(None)
        .expect("pool")
        .is_empty());
    assert_eq!(
        fixture
            .services
            .sponsorships
            .active_for_student(&student("claimed"))
            .expect("lookup")
            .map(|active| active.id),
        Some(sponsorship.id)
    );

    let notice = fixture
        .outbox
        .sent()
        .into_iter()
        .find(|notification| notification.template == "sponsorship_claimed")
        .expect("student told about the sponsor");
    assert_eq!(notice.audience, Audience::Student(student("claimed")));
    assert_eq!(notice.details.get("cadence").map(String::as_str), Some("monthly"));
}

#[test]
fn concurrent_claims_have_exactly_one_winner() {
    let fixture = fixture();
    approved(&fixture, &student("contested"), 1_000);

    let results: Vec<_> = std::thread::scope(|scope| {
        let handles: Vec<_> = (0..8)
            .map(|donor| {
                let sponsorships = fixture.services.sponsorships.clone();
                scope.spawn(move || {
                    sponsorships.claim(claim(
                        "contested",
                        &format!("don-{donor}"),
                        1_000,
                        Cadence::Quarterly,
                    ))
                })
            })
            .collect();
        handles
            .into_iter()
            .map(|handle| handle.join().expect("claim thread"))
            .collect()
    });

    let winners = results.iter().filter(|result| result.is_ok()).count();
    assert_eq!(winners, 1);
    assert!(results.iter().filter_map(|result| result.as_ref().err()).all(
        |error| matches!(error, SponsorshipError::AlreadySponsored(id) if *id == student("contested"))
    ));
}

#[test]
fn claims_need_an_approved_listing_and_the_exact_need() {
    let fixture = fixture();
    submitted(&fixture, &student("unlisted"), 1_000);

    let unlisted = fixture
        .services
        .sponsorships
        .claim(claim("unlisted", "don-1", 1_000, Cadence::OneTime));
    assert!(matches!(unlisted, Err(SponsorshipError::NotEligible(_))));

    approved(&fixture, &student("exact"), 1_000);
    match fixture
        .services
        .sponsorships
        .claim(claim("exact", "don-1", 900, Cadence::OneTime))
    {
        Err(SponsorshipError::AmountMismatch { expected, offered }) => {
            assert_eq!(expected, 1_000);
            assert_eq!(offered, 900);
        }
        other => panic!("expected amount mismatch, got {other:?}"),
    }
    assert_eq!(
        fixture
            .services
            .sponsorships
            .pool(None)
            .expect("pool")
            .len(),
        1
    );
}

#[test]
fn plans_that_cannot_be_split_are_rejected_before_binding() {
    let fixture = fixture();
    approved(&fixture, &student("tiny"), 25);

    let result = fixture
        .services
        .sponsorships
        .claim(claim("tiny", "don-1", 25, Cadence::Monthly));
    assert!(matches!(
        result,
        Err(SponsorshipError::Plan(PlanError::InvalidAmount { .. }))
    ));

    let listing = fixture
        .repositories
        .sponsorships
        .listing(&student("tiny"))
        .expect("pool readable");
    assert!(listing.is_some(), "failed claim must leave the listing alone");
}

#[test]
fn release_relists_the_unpaid_need() {
    let fixture = fixture();
    approved(&fixture, &student("released"), 1_000);
    let sponsorship = fixture
        .services
        .sponsorships
        .claim(claim("released", "don-1", 1_000, Cadence::Annual))
        .expect("claimed");
    fixture
        .services
        .sponsorships
        .settle_installment(&sponsorship.id, 1, 500, IntentId::new("pi_manual"))
        .expect("first half settled");

    let donor_attempt = fixture
        .services
        .sponsorships
        .release(&sponsorship.id, &Actor::Donor(DonorId::new("don-1")));
    assert!(matches!(
        donor_attempt,
        Err(SponsorshipError::NotAuthorized(_))
    ));

    let released = fixture
        .services
        .sponsorships
        .release(&sponsorship.id, &Actor::Administrator(admin()))
        .expect("released");
    assert_eq!(released.status, SponsorshipStatus::Cancelled);
    assert_eq!(released.released_by, Some(admin()));

    let listing = fixture
        .repositories
        .sponsorships
        .listing(&student("released"))
        .expect("pool readable")
        .expect("relisted");
    assert_eq!(listing.outstanding_need, 500);
    assert!(fixture
        .outbox
        .templates()
        .contains(&"sponsorship_released".to_string()));

    let again = fixture
        .services
        .sponsorships
        .release(&sponsorship.id, &Actor::Administrator(admin()));
    assert!(matches!(again, Err(SponsorshipError::CannotRelease { .. })));

    let settle_after = fixture.services.sponsorships.settle_installment(
        &sponsorship.id,
        2,
        500,
        IntentId::new("pi_late"),
    );
    assert!(matches!(settle_after, Err(SponsorshipError::Inactive(_))));

    fixture
        .services
        .sponsorships
        .claim(claim("released", "don-2", 500, Cadence::OneTime))
        .expect("a new donor picks up the remainder");
}

#[test]
fn settling_every_installment_sponsors_the_application() {
    let fixture = fixture();
    let record = approved(&fixture, &student("settled"), 1_000);
    let sponsorship = fixture
        .services
        .sponsorships
        .claim(claim("settled", "don-1", 1_000, Cadence::Annual))
        .expect("claimed");

    let wrong_amount = fixture.services.sponsorships.settle_installment(
        &sponsorship.id,
        1,
        400,
        IntentId::new("pi_a"),
    );
    assert!(matches!(
        wrong_amount,
        Err(SponsorshipError::AmountMismatch { .. })
    ));
    let out_of_plan = fixture.services.sponsorships.settle_installment(
        &sponsorship.id,
        3,
        500,
        IntentId::new("pi_a"),
    );
    assert!(matches!(
        out_of_plan,
        Err(SponsorshipError::UnknownInstallment(3))
    ));

    let first = fixture
        .services
        .sponsorships
        .settle_installment(&sponsorship.id, 1, 500, IntentId::new("pi_a"))
        .expect("first");
    assert_eq!(first.status, SponsorshipStatus::Active);
    let replay = fixture
        .services
        .sponsorships
        .settle_installment(&sponsorship.id, 1, 500, IntentId::new("pi_other"))
        .expect("replay is a no-op");
    assert_eq!(replay.version, first.version);
    assert_eq!(replay.settled.len(), 1);

    let last = fixture
        .services
        .sponsorships
        .settle_installment(&sponsorship.id, 2, 500, IntentId::new("pi_b"))
        .expect("second");
    assert_eq!(last.status, SponsorshipStatus::Completed);
    assert_eq!(last.outstanding(), 0);

    let application = fixture
        .services
        .applications
        .get(&record.application_id)
        .expect("application");
    assert_eq!(application.status, ApplicationStatus::Sponsored);

    let completed = fixture
        .services
        .sponsorships
        .release(&sponsorship.id, &Actor::Administrator(admin()));
    assert!(matches!(
        completed,
        Err(SponsorshipError::CannotRelease { .. })
    ));
}

#[test]
fn pool_is_capped_at_the_page_size() {
    let fixture = fixture();
    for suffix in ["pool-a", "pool-b", "pool-c"] {
        approved(&fixture, &student(suffix), 700);
    }

    let page = fixture
        .services
        .sponsorships
        .pool(Some(2))
        .expect("pool");
    assert_eq!(page.len(), 2);
    assert_eq!(page[0].student_id, student("pool-a"));

    let everything = fixture
        .services
        .sponsorships
        .pool(Some(10_000))
        .expect("pool");
    assert_eq!(everything.len(), 3);
}

#[test]
fn sponsored_status_cannot_be_taken_without_a_paid_sponsorship() {
    let fixture = fixture();
    let record = approved(&fixture, &student("shortcut"), 1_000);

    let shortcut = fixture.services.applications.transition(
        &record.application_id,
        TransitionRequest::new(
            ApplicationStatus::Sponsored,
            Actor::Donor(DonorId::new("don-rogue")),
        ),
    );
    assert!(matches!(
        shortcut,
        Err(ApplicationError::AdvisoryNotSatisfied { .. })
    ));

    let application = fixture
        .services
        .applications
        .get(&record.application_id)
        .expect("application");
    assert_eq!(application.status, ApplicationStatus::Approved);
    assert_eq!(fixture.services.sponsorships.pool(None).expect("pool").len(), 1);

    let duplicate = fixture
        .services
        .applications
        .create_draft(student("shortcut"), details(1_000));
    assert!(matches!(
        duplicate,
        Err(ApplicationError::DuplicateApplication(_))
    ));
}

#[test]
fn stale_listing_for_an_unapproved_application_cannot_be_claimed() {
    let fixture = fixture();
    let record = case_worker_approved(&fixture, &student("stale"), 1_000);
    fixture
        .repositories
        .sponsorships
        .list_student(PoolListing {
            student_id: student("stale"),
            application_id: record.application_id.clone(),
            outstanding_need: 1_000,
            currency: "PKR".to_string(),
            listed_at: Utc::now(),
        })
        .expect("listing stored");

    let result = fixture
        .services
        .sponsorships
        .claim(claim("stale", "don-1", 1_000, Cadence::OneTime));
    assert!(matches!(result, Err(SponsorshipError::NotEligible(_))));
    assert!(fixture
        .services
        .sponsorships
        .active_for_student(&student("stale"))
        .expect("lookup")
        .is_none());
}

#[test]
fn leaving_approved_clears_any_pool_listing() {
    let fixture = fixture();
    approved(&fixture, &student("delisted"), 1_000);
    let sponsorship = fixture
        .services
        .sponsorships
        .claim(claim("delisted", "don-1", 1_000, Cadence::OneTime))
        .expect("claimed");

    // A listing that outlived the claim must not survive the move to SPONSORED.
    fixture
        .repositories
        .sponsorships
        .list_student(PoolListing {
            student_id: student("delisted"),
            application_id: sponsorship.application_id.clone(),
            outstanding_need: 1_000,
            currency: "PKR".to_string(),
            listed_at: Utc::now(),
        })
        .expect("listing stored");

    fixture
        .services
        .sponsorships
        .settle_installment(&sponsorship.id, 1, 1_000, IntentId::new("pi_delisted"))
        .expect("settled");

    let application = fixture
        .services
        .applications
        .get(&sponsorship.application_id)
        .expect("application");
    assert_eq!(application.status, ApplicationStatus::Sponsored);
    assert!(fixture
        .services
        .sponsorships
        .pool(None)
        .expect("pool")
        .is_empty());
}

#[test]
fn resettling_a_completed_sponsorship_finishes_the_application() {
    let fixture = fixture();
    approved(&fixture, &student("unfinished"), 1_000);
    let mut sponsorship = fixture
        .services
        .sponsorships
        .claim(claim("unfinished", "don-1", 1_000, Cadence::OneTime))
        .expect("claimed");

    // Installment recorded but the application never reached SPONSORED.
    sponsorship.settled.push(SettledInstallment {
        index: 1,
        amount: 1_000,
        intent_id: IntentId::new("pi_unfinished"),
        settled_at: Utc::now(),
    });
    sponsorship.status = SponsorshipStatus::Completed;
    let stored = fixture
        .repositories
        .sponsorships
        .update(sponsorship)
        .expect("stored");

    let again = fixture
        .services
        .sponsorships
        .settle_installment(&stored.id, 1, 1_000, IntentId::new("pi_unfinished"))
        .expect("idempotent settle");
    assert_eq!(again.settled.len(), 1);
    assert_eq!(
        fixture
            .services
            .applications
            .get(&stored.application_id)
            .expect("application")
            .status,
        ApplicationStatus::Sponsored
    );
}
