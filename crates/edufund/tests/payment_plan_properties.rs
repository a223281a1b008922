//! Property tests for the installment split.

use chrono::NaiveDate;
use edufund::workflows::funding::payments::{Cadence, PaymentPlan, PlanError};
use proptest::prelude::*;

fn arb_cadence() -> impl Strategy<Value = Cadence> {
    prop::sample::select(Cadence::ALL.to_vec())
}

fn arb_start() -> impl Strategy<Value = NaiveDate> {
    (2020i32..2040, 1u32..=12, 1u32..=31).prop_filter_map("valid calendar date", |(y, m, d)| {
        NaiveDate::from_ymd_opt(y, m, d)
    })
}

proptest! {
    #[test]
    fn installments_always_sum_to_the_total(total in 1u64..5_000_000, cadence in arb_cadence()) {
        let count = u64::from(cadence.installment_count());
        let per = total.div_ceil(count);

        match PaymentPlan::build(total, cadence) {
            Ok(plan) => {
                let amounts: Vec<u64> = plan.installments().iter().map(|i| i.amount).collect();
                prop_assert_eq!(amounts.len() as u64, count);
                prop_assert_eq!(amounts.iter().sum::<u64>(), total);
                prop_assert!(amounts.iter().all(|amount| *amount > 0));
                prop_assert!(amounts[..amounts.len() - 1].iter().all(|amount| *amount == per));
                prop_assert!(amounts[amounts.len() - 1] <= per);
            }
            Err(PlanError::InvalidAmount { .. }) => {
                prop_assert!(per * (count - 1) >= total);
            }
            Err(other) => prop_assert!(false, "unexpected error {other}"),
        }
    }

    #[test]
    fn large_totals_never_fail(total in 600u64..10_000_000, cadence in arb_cadence()) {
        prop_assert!(PaymentPlan::build(total, cadence).is_ok());
    }

    #[test]
    fn schedule_starts_on_the_start_date_and_never_goes_backwards(
        total in 1_000u64..1_000_000,
        cadence in arb_cadence(),
        start in arb_start(),
    ) {
        let plan = PaymentPlan::build(total, cadence).expect("plan");
        let schedule = plan.schedule_from(start).expect("schedule");

        prop_assert_eq!(schedule.len(), plan.len());
        prop_assert_eq!(schedule[0].due_on, start);
        prop_assert!(schedule.windows(2).all(|pair| pair[0].due_on < pair[1].due_on));
    }
}

#[test]
fn zero_total_is_invalid_for_every_cadence() {
    for cadence in Cadence::ALL {
        assert!(matches!(
            PaymentPlan::build(0, cadence),
            Err(PlanError::InvalidAmount { total: 0, .. })
        ));
    }
}
