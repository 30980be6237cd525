//! Adherence statistics over logged doses.
//!
//! Records are expected to be scoped to one patient and period already; this
//! module only aggregates. Anything not explicitly `taken` or `missed`
//! (including records with no status) counts as skipped.

use crate::{AdherenceStats, DateRange, DoseRecord, DoseStatus};
use rust_decimal::{Decimal, RoundingStrategy};

/// Reduce dose records into adherence statistics
pub fn compute(records: &[DoseRecord], period: DateRange, side_effect_count: u32) -> AdherenceStats {
    let total_doses = count(records.len());
    let taken_doses = count_status(records, DoseStatus::Taken);
    let missed_doses = count_status(records, DoseStatus::Missed);
    let skipped_doses = total_doses - taken_doses - missed_doses;

    let adherence_rate = adherence_rate(taken_doses, total_doses);

    tracing::debug!(
        "Adherence {}..{}: {}/{} taken, {} missed, {} skipped ({}%)",
        period.start,
        period.end,
        taken_doses,
        total_doses,
        missed_doses,
        skipped_doses,
        adherence_rate
    );

    AdherenceStats {
        total_doses,
        taken_doses,
        missed_doses,
        skipped_doses,
        side_effect_count,
        adherence_rate,
        period,
    }
}

/// Percentage of doses taken, rounded half away from zero to two places
pub fn adherence_rate(taken: u32, total: u32) -> Decimal {
    if total == 0 {
        return Decimal::ZERO;
    }

    (Decimal::from(taken) * Decimal::ONE_HUNDRED / Decimal::from(total))
        .round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero)
}

fn count_status(records: &[DoseRecord], status: DoseStatus) -> u32 {
    count(records.iter().filter(|r| r.status == Some(status)).count())
}

fn count(n: usize) -> u32 {
    u32::try_from(n).unwrap_or(u32::MAX)
}
