//! Core domain types for protocol scheduling and adherence.
//!
//! This module defines the fundamental types used throughout the system:
//! - Frequency codes and dosing definitions
//! - Resolved schedule events
//! - Dose and side-effect records
//! - Stored protocols, substances and patients
//! - Response shapes exposed at the API boundary

use crate::{Error, Result};
use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

// ============================================================================
// Frequency Codes
// ============================================================================

/// How often a substance is dosed
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum FrequencyCode {
    #[serde(rename = "daily")]
    Daily,
    #[serde(rename = "2x_daily")]
    TwiceDaily,
    #[serde(rename = "3x_daily")]
    ThreeTimesDaily,
    #[serde(rename = "weekly")]
    Weekly,
    #[serde(rename = "2x_weekly")]
    TwiceWeekly,
    #[serde(rename = "3x_weekly")]
    ThreeTimesWeekly,
    #[serde(rename = "as_needed")]
    AsNeeded,
}

impl FrequencyCode {
    pub fn as_str(&self) -> &'static str {
        match self {
            FrequencyCode::Daily => "daily",
            FrequencyCode::TwiceDaily => "2x_daily",
            FrequencyCode::ThreeTimesDaily => "3x_daily",
            FrequencyCode::Weekly => "weekly",
            FrequencyCode::TwiceWeekly => "2x_weekly",
            FrequencyCode::ThreeTimesWeekly => "3x_weekly",
            FrequencyCode::AsNeeded => "as_needed",
        }
    }

    /// Doses on a given calendar day, counted from the weekly anchor day.
    ///
    /// `days_from_anchor` is the number of days since the day whose weekday
    /// anchors weekly slots. Weekly codes use offsets {0}, {0, 3} and
    /// {0, 2, 4}; `as_needed` is patient-initiated and never scheduled.
    pub fn occurrences_on(&self, days_from_anchor: i64) -> u8 {
        let slot = days_from_anchor.rem_euclid(7);
        match self {
            FrequencyCode::Daily => 1,
            FrequencyCode::TwiceDaily => 2,
            FrequencyCode::ThreeTimesDaily => 3,
            FrequencyCode::Weekly => u8::from(slot == 0),
            FrequencyCode::TwiceWeekly => u8::from(slot == 0 || slot == 3),
            FrequencyCode::ThreeTimesWeekly => u8::from(matches!(slot, 0 | 2 | 4)),
            FrequencyCode::AsNeeded => 0,
        }
    }
}

impl FromStr for FrequencyCode {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "daily" => Ok(FrequencyCode::Daily),
            "2x_daily" => Ok(FrequencyCode::TwiceDaily),
            "3x_daily" => Ok(FrequencyCode::ThreeTimesDaily),
            "weekly" => Ok(FrequencyCode::Weekly),
            "2x_weekly" => Ok(FrequencyCode::TwiceWeekly),
            "3x_weekly" => Ok(FrequencyCode::ThreeTimesWeekly),
            "as_needed" => Ok(FrequencyCode::AsNeeded),
            other => Err(Error::InvalidDefinition(format!(
                "Unknown frequency code: {}",
                other
            ))),
        }
    }
}

impl fmt::Display for FrequencyCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ============================================================================
// Dosing Definitions
// ============================================================================

/// One row of a titration table
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct WeekEntry {
    pub week_number: u32,
    pub dose: Decimal,
    pub unit: String,
    pub frequency: FrequencyCode,
    pub note: Option<String>,
}

/// How a substance is dosed, resolved from stored protocol fields
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum DosingDefinition {
    /// Same dose at the same frequency for the whole protocol
    Fixed {
        dose: Decimal,
        unit: String,
        frequency: FrequencyCode,
    },
    /// Week-indexed table of doses, ending after the last listed week
    ///
    /// Weeks missing from a sparse table keep the most recent earlier entry;
    /// weeks before the first entry schedule nothing.
    Titration { weeks: Vec<WeekEntry> },
    /// `cycle_on_weeks` of dosing followed by `cycle_off_weeks` of rest, repeating
    Cycling {
        dose: Decimal,
        unit: String,
        frequency: FrequencyCode,
        cycle_on_weeks: u32,
        cycle_off_weeks: u32,
    },
}

// ============================================================================
// Schedule Types
// ============================================================================

/// Substance identity carried onto every resolved event
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SubstanceRef {
    pub id: String,
    pub name: String,
}

impl SubstanceRef {
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
        }
    }
}

/// Inclusive calendar date range
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct DateRange {
    pub start: NaiveDate,
    pub end: NaiveDate,
}

impl DateRange {
    /// Build a range, rejecting `end` before `start`
    pub fn new(start: NaiveDate, end: NaiveDate) -> Result<Self> {
        let range = Self { start, end };
        range.validate()?;
        Ok(range)
    }

    pub fn validate(&self) -> Result<()> {
        if self.end < self.start {
            return Err(Error::InvalidRange(format!(
                "end date {} is before start date {}",
                self.end, self.start
            )));
        }
        Ok(())
    }

    /// Number of days between start and end (0 for a single-day range)
    pub fn span_days(&self) -> i64 {
        (self.end - self.start).num_days()
    }

    pub fn contains(&self, date: NaiveDate) -> bool {
        self.start <= date && date <= self.end
    }

    /// Every calendar day in the range, ascending
    pub fn days(&self) -> impl Iterator<Item = NaiveDate> {
        let end = self.end;
        self.start.iter_days().take_while(move |d| *d <= end)
    }
}

/// A single expected dose on a calendar day
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ScheduleEvent {
    pub date: NaiveDate,
    pub substance_id: String,
    pub substance_name: String,
    pub dose: Decimal,
    pub unit: Option<String>,
    pub frequency: Option<FrequencyCode>,
    /// 1-based occurrence within the day for this substance
    pub ordinal: u8,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub note: Option<String>,
}

// ============================================================================
// Dose Records
// ============================================================================

/// Outcome recorded for a logged dose
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum DoseStatus {
    Taken,
    Missed,
    Skipped,
}

impl FromStr for DoseStatus {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "taken" => Ok(DoseStatus::Taken),
            "missed" => Ok(DoseStatus::Missed),
            "skipped" => Ok(DoseStatus::Skipped),
            other => Err(Error::InvalidRecord(format!("Unknown dose status: {}", other))),
        }
    }
}

/// A dose logged by or for a patient
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct DoseRecord {
    pub id: Uuid,
    pub patient_id: String,
    pub substance_id: String,
    pub dose_amount: Decimal,
    /// `None` when nothing was recorded for the dose
    #[serde(default)]
    pub status: Option<DoseStatus>,
    pub logged_at: DateTime<Utc>,
    #[serde(default)]
    pub notes: Option<String>,
}

impl DoseRecord {
    /// Reject records that could never have been administered
    pub fn validate(&self) -> Result<()> {
        if self.dose_amount <= Decimal::ZERO {
            return Err(Error::InvalidRecord(format!(
                "dose amount must be positive, got {}",
                self.dose_amount
            )));
        }
        Ok(())
    }
}

/// A reported side effect
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct SideEffectRecord {
    pub id: Uuid,
    pub patient_id: String,
    #[serde(default)]
    pub substance_id: Option<String>,
    pub description: String,
    #[serde(default)]
    pub severity: Option<String>,
    pub logged_at: DateTime<Utc>,
}

/// Aggregate adherence over a period
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct AdherenceStats {
    pub total_doses: u32,
    pub taken_doses: u32,
    pub missed_doses: u32,
    pub skipped_doses: u32,
    pub side_effect_count: u32,
    /// Percentage of doses taken, two decimal places
    pub adherence_rate: Decimal,
    pub period: DateRange,
}

// ============================================================================
// Stored Entities
// ============================================================================

/// A patient as known to the protocol store
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Patient {
    pub id: String,
    pub clinic_id: String,
    pub name: String,
}

/// Dosing fields for one substance of a protocol, exactly as stored
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Default)]
#[serde(rename_all = "camelCase")]
pub struct ProtocolSubstance {
    pub substance_id: String,
    pub substance_name: String,
    #[serde(default)]
    pub dose: Option<Decimal>,
    #[serde(default)]
    pub dose_unit: Option<String>,
    #[serde(default)]
    pub frequency: Option<String>,
    /// Untyped JSON blob, validated into a titration table on use
    #[serde(default)]
    pub titration_plan: Option<serde_json::Value>,
    #[serde(default)]
    pub cycle_on_weeks: Option<i64>,
    #[serde(default)]
    pub cycle_off_weeks: Option<i64>,
}

impl ProtocolSubstance {
    pub fn substance_ref(&self) -> SubstanceRef {
        SubstanceRef::new(self.substance_id.clone(), self.substance_name.clone())
    }
}

/// A treatment protocol with its substances
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Protocol {
    pub id: String,
    pub patient_id: String,
    pub clinic_id: String,
    pub name: String,
    #[serde(default)]
    pub start_date: Option<NaiveDate>,
    #[serde(default)]
    pub substances: Vec<ProtocolSubstance>,
}

/// Contents of the file-backed catalog
#[derive(Clone, Debug, Serialize, Deserialize, Default)]
pub struct Catalog {
    #[serde(default)]
    pub patients: Vec<Patient>,
    #[serde(default)]
    pub protocols: Vec<Protocol>,
}

// ============================================================================
// Response Shapes
// ============================================================================

/// Resolved schedule for a protocol and the window actually used
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ScheduleResponse {
    pub schedule: Vec<ScheduleEvent>,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
}

/// Adherence statistics for a patient
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct StatsResponse {
    pub stats: AdherenceStats,
}
