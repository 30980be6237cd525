//! Schedule and adherence entry points used by the API layer.
//!
//! Both entry points follow the same shape:
//! 1. Resolve the effective date window (defaults from config)
//! 2. Load the subject from its store (`NotFound` if absent)
//! 3. Run the delegated access check (`Forbidden` on denial)
//! 4. Compute the response from pure resolution/aggregation

use crate::config::{ScheduleConfig, StatsConfig};
use crate::store::{AccessPolicy, DoseStore, PatientDirectory, ProtocolStore};
use crate::{
    adherence, resolver, DateRange, DosingDefinition, Error, Result, ScheduleResponse,
    StatsResponse,
};
use chrono::{Duration, NaiveDate};

/// Requested window; missing bounds are filled in from configuration
#[derive(Clone, Copy, Debug, Default)]
pub struct WindowQuery {
    pub start: Option<NaiveDate>,
    pub end: Option<NaiveDate>,
}

impl WindowQuery {
    pub fn new(start: Option<NaiveDate>, end: Option<NaiveDate>) -> Self {
        Self { start, end }
    }

    /// Fill in missing bounds around `today` and enforce the maximum span
    ///
    /// With no bounds the window is `today + offset .. today + offset + window_days`.
    /// With one bound the other is `window_days` away from it.
    fn effective(
        &self,
        today: NaiveDate,
        offset_days: i64,
        window_days: i64,
        max_range_days: i64,
    ) -> Result<DateRange> {
        let window = Duration::try_days(window_days).ok_or_else(|| {
            Error::InvalidRange(format!("window of {} days is out of range", window_days))
        })?;
        let (start, end) = match (self.start, self.end) {
            (Some(start), Some(end)) => (start, end),
            (Some(start), None) => (start, shift(start, window)?),
            (None, Some(end)) => (shift(end, -window)?, end),
            (None, None) => {
                let offset = Duration::try_days(offset_days).ok_or_else(|| {
                    Error::InvalidRange(format!("offset of {} days is out of range", offset_days))
                })?;
                let start = shift(today, offset)?;
                (start, shift(start, window)?)
            }
        };

        let range = DateRange::new(start, end)?;
        if range.span_days() > max_range_days {
            return Err(Error::InvalidRange(format!(
                "range of {} days exceeds the maximum of {} days",
                range.span_days(),
                max_range_days
            )));
        }
        Ok(range)
    }
}

/// Move a date by `delta`, failing instead of leaving the calendar
fn shift(date: NaiveDate, delta: Duration) -> Result<NaiveDate> {
    date.checked_add_signed(delta).ok_or_else(|| {
        Error::InvalidRange(format!("{} shifted by {} days is out of range", date, delta.num_days()))
    })
}

/// Resolve the combined schedule of every substance in a protocol
///
/// Protocols without a start date are anchored on `today`. Events are merged
/// with a stable sort by date, so within a day substances keep their stored
/// order and each substance keeps its ordinal order.
pub fn protocol_schedule<S, A>(
    store: &S,
    access: &A,
    protocol_id: &str,
    query: WindowQuery,
    today: NaiveDate,
    config: &ScheduleConfig,
) -> Result<ScheduleResponse>
where
    S: ProtocolStore + ?Sized,
    A: AccessPolicy + ?Sized,
{
    let range = query.effective(today, 0, config.default_window_days, config.max_range_days)?;

    let protocol = store
        .get_protocol_with_substances(protocol_id)?
        .ok_or_else(|| Error::NotFound(format!("protocol {}", protocol_id)))?;

    access.authorize(&protocol.clinic_id)?;

    let protocol_start = protocol.start_date.unwrap_or(today);

    let mut schedule = Vec::new();
    for substance in &protocol.substances {
        let definition = DosingDefinition::from_stored(substance).map_err(|e| match e {
            Error::InvalidDefinition(msg) => Error::InvalidDefinition(format!(
                "substance {} in protocol {}: {}",
                substance.substance_id, protocol.id, msg
            )),
            other => other,
        })?;

        schedule.extend(resolver::resolve(
            &definition,
            &substance.substance_ref(),
            &range,
            protocol_start,
        )?);
    }
    schedule.sort_by_key(|event| event.date);

    tracing::info!(
        "Resolved {} scheduled doses for protocol {} ({} substances) from {} to {}",
        schedule.len(),
        protocol.id,
        protocol.substances.len(),
        range.start,
        range.end
    );

    Ok(ScheduleResponse {
        schedule,
        start_date: range.start,
        end_date: range.end,
    })
}

/// Compute adherence statistics for a patient
///
/// The default window is the `default_window_days` ending today.
pub fn adherence_stats<P, D, A>(
    patients: &P,
    doses: &D,
    access: &A,
    patient_id: &str,
    query: WindowQuery,
    today: NaiveDate,
    config: &StatsConfig,
) -> Result<StatsResponse>
where
    P: PatientDirectory + ?Sized,
    D: DoseStore + ?Sized,
    A: AccessPolicy + ?Sized,
{
    let range = query.effective(
        today,
        -config.default_window_days,
        config.default_window_days,
        config.max_range_days,
    )?;

    let patient = patients
        .get_patient(patient_id)?
        .ok_or_else(|| Error::NotFound(format!("patient {}", patient_id)))?;

    access.authorize(&patient.clinic_id)?;

    let records = doses.find_dose_records(&patient.id, &range)?;
    let side_effects = doses.count_side_effects(&patient.id, &range)?;
    let stats = adherence::compute(&records, range, side_effects);

    tracing::info!(
        "Adherence for patient {} from {} to {}: {}% of {} doses",
        patient.id,
        range.start,
        range.end,
        stats.adherence_rate,
        stats.total_doses
    );

    Ok(StatsResponse { stats })
}
