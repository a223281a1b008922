//! Installment split for a sponsorship amount.
//!
//! Every installment but the last is `ceil(total / count)`; the last carries whatever is
//! left so the plan always sums to the total.

use std::fmt;
use std::io::Write;
use std::str::FromStr;

use chrono::{Months, NaiveDate};
use serde::{Deserialize, Serialize};

/// How often a donor pays toward the sponsorship.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Cadence {
    OneTime,
    Monthly,
    Quarterly,
    BiAnnual,
    Annual,
}

impl Cadence {
    pub const ALL: [Cadence; 5] = [
        Cadence::OneTime,
        Cadence::Monthly,
        Cadence::Quarterly,
        Cadence::BiAnnual,
        Cadence::Annual,
    ];

    /// Number of installments over the two-year sponsorship horizon.
    pub const fn installment_count(self) -> u32 {
        match self {
            Cadence::OneTime => 1,
            Cadence::Monthly => 24,
            Cadence::Quarterly => 8,
            Cadence::BiAnnual => 4,
            Cadence::Annual => 2,
        }
    }

    pub const fn months_between(self) -> u32 {
        match self {
            Cadence::OneTime => 0,
            Cadence::Monthly => 1,
            Cadence::Quarterly => 3,
            Cadence::BiAnnual => 6,
            Cadence::Annual => 12,
        }
    }

    pub const fn label(self) -> &'static str {
        match self {
            Cadence::OneTime => "one_time",
            Cadence::Monthly => "monthly",
            Cadence::Quarterly => "quarterly",
            Cadence::BiAnnual => "bi_annual",
            Cadence::Annual => "annual",
        }
    }
}

impl fmt::Display for Cadence {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl FromStr for Cadence {
    type Err = PlanError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let normalized = value.trim().to_ascii_lowercase().replace(['-', ' '], "_");
        match normalized.as_str() {
            "one_time" | "onetime" | "once" => Ok(Cadence::OneTime),
            "monthly" => Ok(Cadence::Monthly),
            "quarterly" => Ok(Cadence::Quarterly),
            "bi_annual" | "biannual" | "semi_annual" => Ok(Cadence::BiAnnual),
            "annual" | "yearly" => Ok(Cadence::Annual),
            _ => Err(PlanError::UnknownCadence(value.to_string())),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Installment {
    /// 1-based position in the plan; also the idempotency suffix for charges.
    pub index: u32,
    pub amount: u64,
    pub due_offset_months: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ScheduledInstallment {
    pub index: u32,
    pub amount: u64,
    pub due_on: NaiveDate,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PaymentPlan {
    pub total: u64,
    pub cadence: Cadence,
    installments: Vec<Installment>,
}

impl PaymentPlan {
    pub fn build(total: u64, cadence: Cadence) -> Result<Self, PlanError> {
        let invalid = || PlanError::InvalidAmount { total, cadence };
        if total == 0 {
            return Err(invalid());
        }

        let count = u64::from(cadence.installment_count());
        let per = total.div_ceil(count);
        let leading = per.checked_mul(count - 1).ok_or_else(invalid)?;
        // Ceiling split of a small total can use up the whole amount early.
        let last = match total.checked_sub(leading) {
            Some(last) if last > 0 => last,
            _ => return Err(invalid()),
        };

        let step = cadence.months_between();
        let installments = (1..=cadence.installment_count())
            .map(|index| Installment {
                index,
                amount: if u64::from(index) == count { last } else { per },
                due_offset_months: step * (index - 1),
            })
            .collect();

        Ok(Self {
            total,
            cadence,
            installments,
        })
    }

    pub fn installments(&self) -> &[Installment] {
        &self.installments
    }

    pub fn installment(&self, index: u32) -> Option<&Installment> {
        self.installments
            .iter()
            .find(|installment| installment.index == index)
    }

    pub fn len(&self) -> usize {
        self.installments.len()
    }

    pub fn is_empty(&self) -> bool {
        self.installments.is_empty()
    }

    /// Calendar due dates counted from `start`.
    pub fn schedule_from(&self, start: NaiveDate) -> Result<Vec<ScheduledInstallment>, PlanError> {
        self.installments
            .iter()
            .map(|installment| {
                let due_on = start
                    .checked_add_months(Months::new(installment.due_offset_months))
                    .ok_or(PlanError::DateOutOfRange(start))?;
                Ok(ScheduledInstallment {
                    index: installment.index,
                    amount: installment.amount,
                    due_on,
                })
            })
            .collect()
    }

    /// Export the plan as CSV. Due dates are included when a start date is given.
    pub fn write_csv<W: Write>(&self, writer: W, start: Option<NaiveDate>) -> Result<(), PlanError> {
        let mut csv_writer = csv::Writer::from_writer(writer);
        match start {
            Some(start) => {
                csv_writer.write_record(["index", "amount", "due_offset_months", "due_on"])?;
                for (installment, scheduled) in
                    self.installments.iter().zip(self.schedule_from(start)?)
                {
                    csv_writer.write_record([
                        installment.index.to_string(),
                        installment.amount.to_string(),
                        installment.due_offset_months.to_string(),
                        scheduled.due_on.format("%Y-%m-%d").to_string(),
                    ])?;
                }
            }
            None => {
                csv_writer.write_record(["index", "amount", "due_offset_months"])?;
                for installment in &self.installments {
                    csv_writer.write_record([
                        installment.index.to_string(),
                        installment.amount.to_string(),
                        installment.due_offset_months.to_string(),
                    ])?;
                }
            }
        }
        csv_writer.flush()?;
        Ok(())
    }
}

#[derive(Debug, thiserror::Error)]
pub enum PlanError {
    #[error(
        "amount {total} cannot be split into {} {cadence} installments",
        .cadence.installment_count()
    )]
    InvalidAmount { total: u64, cadence: Cadence },
    #[error("unknown cadence '{0}'")]
    UnknownCadence(String),
    #[error("schedule starting {0} runs past the supported calendar")]
    DateOutOfRange(NaiveDate),
    #[error("failed to write plan CSV: {0}")]
    Csv(#[from] csv::Error),
    #[error("failed to flush plan CSV: {0}")]
    Io(#[from] std::io::Error),
}

impl PlanError {
    pub fn kind(&self) -> &'static str {
        match self {
            PlanError::InvalidAmount { .. } => "invalid_amount",
            PlanError::UnknownCadence(_) => "unknown_cadence",
            PlanError::DateOutOfRange(_) => "date_out_of_range",
            PlanError::Csv(_) | PlanError::Io(_) => "export_failed",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn amounts(plan: &PaymentPlan) -> Vec<u64> {
        plan.installments().iter().map(|i| i.amount).collect()
    }

    #[test]
    fn monthly_plan_puts_remainder_last() {
        let plan = PaymentPlan::build(1000, Cadence::Monthly).expect("plan");
        assert_eq!(plan.len(), 24);
        let amounts = amounts(&plan);
        assert!(amounts[..23].iter().all(|amount| *amount == 42));
        assert_eq!(amounts[23], 34);
        assert_eq!(amounts.iter().sum::<u64>(), 1000);
    }

    #[test]
    fn one_time_plan_is_the_whole_amount() {
        let plan = PaymentPlan::build(750, Cadence::OneTime).expect("plan");
        assert_eq!(amounts(&plan), vec![750]);
        assert_eq!(plan.installments()[0].due_offset_months, 0);
    }

    #[test]
    fn zero_and_unsplittable_totals_are_rejected() {
        assert!(matches!(
            PaymentPlan::build(0, Cadence::Annual),
            Err(PlanError::InvalidAmount { total: 0, .. })
        ));
        // ceil(25 / 24) = 2 would spend 46 before the last installment.
        assert!(matches!(
            PaymentPlan::build(25, Cadence::Monthly),
            Err(PlanError::InvalidAmount { .. })
        ));
        assert!(PaymentPlan::build(24, Cadence::Monthly).is_ok());
    }

    #[test]
    fn plan_errors_read_as_sentences() {
        let error = PaymentPlan::build(25, Cadence::Monthly).expect_err("too small");
        assert_eq!(
            error.to_string(),
            "amount 25 cannot be split into 24 monthly installments"
        );
        assert_eq!(error.kind(), "invalid_amount");

        let unknown = "weekly".parse::<Cadence>().expect_err("unknown");
        assert_eq!(unknown.to_string(), "unknown cadence 'weekly'");
    }

    #[test]
    fn quarterly_schedule_advances_three_months() {
        let plan = PaymentPlan::build(800, Cadence::Quarterly).expect("plan");
        let start = NaiveDate::from_ymd_opt(2026, 1, 31).expect("date");
        let schedule = plan.schedule_from(start).expect("schedule");
        assert_eq!(schedule[0].due_on, start);
        assert_eq!(
            schedule[1].due_on,
            NaiveDate::from_ymd_opt(2026, 4, 30).expect("date")
        );
        assert_eq!(schedule.len(), 8);
    }

    #[test]
    fn cadence_parses_common_spellings() {
        assert_eq!("Bi-Annual".parse::<Cadence>().expect("cadence"), Cadence::BiAnnual);
        assert_eq!("one time".parse::<Cadence>().expect("cadence"), Cadence::OneTime);
        assert!("fortnightly".parse::<Cadence>().is_err());
    }

    #[test]
    fn csv_export_includes_due_dates_when_started() {
        let plan = PaymentPlan::build(300, Cadence::Annual).expect("plan");
        let mut buffer = Vec::new();
        plan.write_csv(
            &mut buffer,
            NaiveDate::from_ymd_opt(2026, 9, 1),
        )
        .expect("csv");
        let text = String::from_utf8(buffer).expect("utf8");
        let lines: Vec<_> = text.lines().collect();
        assert_eq!(lines[0], "index,amount,due_offset_months,due_on");
        assert_eq!(lines[1], "1,150,0,2026-09-01");
        assert_eq!(lines[2], "2,150,12,2027-09-01");
    }
}
