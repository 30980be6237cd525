//! Schedule resolution: dosing definition + date range → expected doses.
//!
//! Resolution is a pure function of its inputs:
//! - **Fixed**: every day in range, expanded by frequency
//! - **Titration**: the week entry in force for each day's protocol week
//! - **Cycling**: fixed expansion on "on" weeks, nothing on "off" weeks
//!
//! Weekly slots are anchored on the weekday of the range start. Empty output
//! for titration weeks outside the table, off weeks, and `as_needed` is a
//! normal result, not an error.

use crate::cycle::{cycle_position_of, week_index_of};
use crate::{
    DateRange, DosingDefinition, FrequencyCode, Result, ScheduleEvent, SubstanceRef, WeekEntry,
};
use chrono::NaiveDate;
use rust_decimal::Decimal;

/// Dose parameters in force on a particular day
struct DayDosing<'a> {
    dose: Decimal,
    unit: &'a str,
    frequency: FrequencyCode,
    note: Option<&'a str>,
}

/// Expand a dosing definition into ordered schedule events
///
/// `protocol_start` anchors week numbering for titration and cycling.
/// Events are ordered by date, then by within-day ordinal.
pub fn resolve(
    definition: &DosingDefinition,
    substance: &SubstanceRef,
    range: &DateRange,
    protocol_start: NaiveDate,
) -> Result<Vec<ScheduleEvent>> {
    range.validate()?;
    definition.validate()?;

    let mut events = Vec::new();
    for date in range.days() {
        if let Some(dosing) = dosing_on(definition, date, protocol_start) {
            expand_day(&mut events, substance, date, range.start, &dosing);
        }
    }

    tracing::debug!(
        "Resolved {} {} events for {} between {} and {}",
        events.len(),
        definition.shape_name(),
        substance.id,
        range.start,
        range.end
    );

    Ok(events)
}

/// Dose parameters for `date`, or `None` when nothing is scheduled that day
fn dosing_on<'a>(
    definition: &'a DosingDefinition,
    date: NaiveDate,
    protocol_start: NaiveDate,
) -> Option<DayDosing<'a>> {
    match definition {
        DosingDefinition::Fixed {
            dose,
            unit,
            frequency,
        } => Some(DayDosing {
            dose: *dose,
            unit,
            frequency: *frequency,
            note: None,
        }),

        DosingDefinition::Titration { weeks } => {
            let week_index = week_index_of(date, protocol_start);
            titration_entry_for(weeks, week_index).map(|entry| DayDosing {
                dose: entry.dose,
                unit: &entry.unit,
                frequency: entry.frequency,
                note: entry.note.as_deref(),
            })
        }

        DosingDefinition::Cycling {
            dose,
            unit,
            frequency,
            cycle_on_weeks,
            cycle_off_weeks,
        } => {
            let week_index = week_index_of(date, protocol_start);
            cycle_position_of(week_index, *cycle_on_weeks, *cycle_off_weeks)
                .is_on
                .then_some(DayDosing {
                    dose: *dose,
                    unit,
                    frequency: *frequency,
                    note: None,
                })
        }
    }
}

/// The titration entry in force during `week_index`
///
/// Sparse tables hold the most recent listed step until the next one. Weeks
/// before the first entry or after the last entry have no dosing.
pub fn titration_entry_for(weeks: &[WeekEntry], week_index: i64) -> Option<&WeekEntry> {
    let last = weeks.last()?;
    if week_index < 1 || week_index > i64::from(last.week_number) {
        return None;
    }

    weeks
        .iter()
        .take_while(|entry| i64::from(entry.week_number) <= week_index)
        .last()
}

fn expand_day(
    events: &mut Vec<ScheduleEvent>,
    substance: &SubstanceRef,
    date: NaiveDate,
    anchor: NaiveDate,
    dosing: &DayDosing<'_>,
) {
    let occurrences = dosing.frequency.occurrences_on((date - anchor).num_days());
    for ordinal in 1..=occurrences {
        events.push(ScheduleEvent {
            date,
            substance_id: substance.id.clone(),
            substance_name: substance.name.clone(),
            dose: dosing.dose,
            unit: Some(dosing.unit.to_string()),
            frequency: Some(dosing.frequency),
            ordinal,
            note: dosing.note.map(str::to_string),
        });
    }
}
