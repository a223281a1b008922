use crate::infra::{in_memory_services, StaticPanelDirectory, DEFAULT_PANEL};
use chrono::{Duration, NaiveDate, Utc};
use clap::Args;
use edufund::config::AppConfig;
use edufund::error::AppError;
use edufund::workflows::funding::applications::{
    ApplicationDetails, ApplicationStatus, ExpenseBreakdown, TransitionRequest,
};
use edufund::workflows::funding::interviews::{Decision, ScheduleRequest};
use edufund::workflows::funding::payments::{Cadence, CreateIntentRequest, PaymentPlan};
use edufund::workflows::funding::sponsorship::ClaimRequest;
use edufund::workflows::funding::verification::{FieldRecommendation, Findings};
use edufund::workflows::funding::{
    Actor, AdminId, DonorId, PanelMemberId, StudentId, VerifierId,
};
use std::io;

#[derive(Args, Debug)]
pub(crate) struct PlanArgs {
    /// Amount to split across installments, in whole currency units
    #[arg(long)]
    pub(crate) total_need: u64,
    /// one_time, monthly, quarterly, bi_annual or annual
    #[arg(long, default_value = "monthly")]
    pub(crate) cadence: Cadence,
    /// First due date (YYYY-MM-DD); adds calendar dates to the output
    #[arg(long, value_parser = crate::infra::parse_date)]
    pub(crate) start: Option<NaiveDate>,
    /// Emit CSV instead of a table
    #[arg(long)]
    pub(crate) csv: bool,
}

#[derive(Args, Debug)]
pub(crate) struct DemoArgs {
    /// Tuition for the demo application
    #[arg(long, default_value_t = 1_800)]
    pub(crate) tuition: u64,
    /// Scholarship already awarded, subtracted from the need
    #[arg(long, default_value_t = 800)]
    pub(crate) scholarship: u64,
    /// Cadence the demo donor pays on
    #[arg(long, default_value = "quarterly")]
    pub(crate) cadence: Cadence,
}

pub(crate) fn run_plan(args: PlanArgs) -> Result<(), AppError> {
    let plan = PaymentPlan::build(args.total_need, args.cadence)?;

    if args.csv {
        plan.write_csv(io::stdout().lock(), args.start)?;
        return Ok(());
    }

    println!(
        "Payment plan: {} over {} installment(s), {}",
        plan.total,
        plan.len(),
        plan.cadence
    );
    match args.start {
        Some(start) => {
            for scheduled in plan.schedule_from(start)? {
                println!(
                    "  #{:<3} {:>10}  due {}",
                    scheduled.index, scheduled.amount, scheduled.due_on
                );
            }
        }
        None => {
            for installment in plan.installments() {
                println!(
                    "  #{:<3} {:>10}  month +{}",
                    installment.index, installment.amount, installment.due_offset_months
                );
            }
        }
    }
    Ok(())
}

pub(crate) async fn run_demo(args: DemoArgs) -> Result<(), AppError> {
    let config = AppConfig::default();
    let (services, outbox) = in_memory_services(&config, StaticPanelDirectory::default());

    let student = StudentId::new("stu-demo");
    let verifier = VerifierId::new("ver-demo");
    let admin = AdminId::new("admin-demo");
    let donor = DonorId::new("don-demo");
    let panel: Vec<PanelMemberId> = DEFAULT_PANEL.into_iter().map(PanelMemberId::new).collect();

    let details = ApplicationDetails {
        institution: "Government College University".to_string(),
        programme: "BS Computer Science".to_string(),
        term: "2026-2027".to_string(),
        currency: None,
        expenses: ExpenseBreakdown {
            tuition: args.tuition,
            hostel: 0,
            living: 0,
            other: 0,
            scholarship: args.scholarship,
        },
    };

    let draft = services
        .applications
        .create_draft(student.clone(), details)
        .map_err(AppError::workflow)?;
    let application_id = draft.application_id.clone();
    println!(
        "[1] Draft {} requests {} {}",
        application_id, draft.requested_amount, draft.currency
    );

    services
        .applications
        .submit(&application_id, &Actor::Student(student.clone()))
        .map_err(AppError::workflow)?;
    println!("[2] Submitted for field verification");

    let review = services
        .reviews
        .assign(&application_id, verifier.clone())
        .map_err(AppError::workflow)?;
    services
        .reviews
        .record_findings(
            &review.id,
            &verifier,
            Findings {
                identity_verified: Some(true),
                income_verified: Some(true),
                documents_verified: Some(true),
                ..Findings::default()
            },
        )
        .map_err(AppError::workflow)?;
    services
        .reviews
        .complete(&review.id, &verifier, FieldRecommendation::Recommend, 85, None)
        .map_err(AppError::workflow)?;
    services
        .applications
        .transition(
            &application_id,
            TransitionRequest::new(
                ApplicationStatus::CaseWorkerApproved,
                Actor::FieldVerifier(verifier.clone()),
            ),
        )
        .map_err(AppError::workflow)?;
    println!("[3] Field review {} recommended; case worker approved", review.id);

    let interview = services
        .interviews
        .schedule(
            &application_id,
            ScheduleRequest {
                scheduled_by: admin,
                scheduled_for: Utc::now() + Duration::days(3),
                panel: panel.clone(),
                location: Some("Board room".to_string()),
            },
        )
        .map_err(AppError::workflow)?;
    for (member, decision) in panel
        .iter()
        .zip([Decision::Approve, Decision::Approve, Decision::Abstain])
    {
        services
            .interviews
            .record_decision(&interview.id, member, decision, None)
            .map_err(AppError::workflow)?;
    }
    let view = services
        .interviews
        .complete(&interview.id)
        .map_err(AppError::workflow)?;
    println!(
        "[4] Interview {} closed: {:?} (approve {}, reject {}, abstain {})",
        interview.id,
        view.outcome.outcome,
        view.outcome.tally.approve,
        view.outcome.tally.reject,
        view.outcome.tally.abstain
    );

    services
        .applications
        .transition(
            &application_id,
            TransitionRequest::new(ApplicationStatus::Approved, Actor::Board(panel[0].clone())),
        )
        .map_err(AppError::workflow)?;
    let pool = services.sponsorships.pool(None).map_err(AppError::workflow)?;
    println!("[5] Approved; {} student(s) awaiting a sponsor", pool.len());

    let sponsorship = services
        .sponsorships
        .claim(ClaimRequest {
            student_id: student.clone(),
            donor_id: donor,
            amount: draft.requested_amount,
            cadence: args.cadence,
        })
        .map_err(AppError::workflow)?;
    println!(
        "[6] Sponsorship {} claimed, paying {}",
        sponsorship.id, sponsorship.cadence
    );

    loop {
        let receipt = services
            .payments
            .create_intent(CreateIntentRequest {
                student_id: student.clone(),
                amount: sponsorship.amount,
                cadence: sponsorship.cadence,
            })
            .await
            .map_err(AppError::workflow)?;
        let payment = services
            .payments
            .confirm(&receipt.intent_id, &sponsorship.id)
            .await
            .map_err(AppError::workflow)?;
        println!(
            "    installment {}/{} paid {} ({} outstanding)",
            payment.installment_index, receipt.installment_count, payment.amount, payment.outstanding
        );
        if payment.outstanding == 0 {
            break;
        }
    }

    let application = services
        .applications
        .get(&application_id)
        .map_err(AppError::workflow)?;
    let path: Vec<&str> = application
        .status_path()
        .into_iter()
        .map(ApplicationStatus::label)
        .collect();
    println!("[7] Final status {}: {}", application.status, path.join(" -> "));
    println!("    notifications sent: {}", outbox.templates().join(", "));
    Ok(())
}
