//! Building dosing definitions from stored protocol fields.
//!
//! Stored substances carry loosely-typed optional fields (a JSON titration
//! blob, optional cycle lengths, optional fixed dose). This module turns them
//! into a [`DosingDefinition`] once, at the boundary, and rejects anything
//! malformed before it reaches date arithmetic.

use crate::{DosingDefinition, Error, FrequencyCode, ProtocolSubstance, Result, WeekEntry};
use rust_decimal::Decimal;
use serde::Deserialize;

/// Titration plan as stored: `{ "weeks": [ { "week": 1, "dose": 250, ... } ] }`
#[derive(Debug, Deserialize)]
struct TitrationPlanFile {
    weeks: Vec<TitrationWeekFile>,
}

#[derive(Debug, Deserialize)]
struct TitrationWeekFile {
    week: i64,
    dose: Decimal,
    unit: String,
    frequency: String,
    #[serde(default)]
    notes: Option<String>,
}

impl TryFrom<TitrationWeekFile> for WeekEntry {
    type Error = Error;

    fn try_from(row: TitrationWeekFile) -> Result<Self> {
        let week_number = u32::try_from(row.week)
            .ok()
            .filter(|w| *w >= 1)
            .ok_or_else(|| {
                Error::InvalidDefinition(format!("Invalid titration week number: {}", row.week))
            })?;

        Ok(WeekEntry {
            week_number,
            dose: row.dose,
            unit: row.unit,
            frequency: row.frequency.parse()?,
            note: row.notes.filter(|n| !n.trim().is_empty()),
        })
    }
}

/// Parse a stored titration plan into validated week entries
///
/// Accepts the plan either as a JSON object or as a JSON-encoded string
/// (text columns hold it that way).
pub fn parse_titration_plan(value: &serde_json::Value) -> Result<Vec<WeekEntry>> {
    let plan: TitrationPlanFile = match value {
        serde_json::Value::String(raw) => serde_json::from_str(raw),
        other => serde_json::from_value(other.clone()),
    }
    .map_err(|e| Error::InvalidDefinition(format!("Malformed titration plan: {}", e)))?;

    let weeks = plan
        .weeks
        .into_iter()
        .map(WeekEntry::try_from)
        .collect::<Result<Vec<_>>>()?;

    validate_weeks(&weeks)?;
    Ok(weeks)
}

impl DosingDefinition {
    /// Build the definition for a stored protocol substance
    ///
    /// Precedence mirrors how protocols are authored:
    /// 1. A titration plan, when present, fully describes the dosing
    /// 2. Cycle lengths turn the base dose into a cycling schedule
    /// 3. Otherwise the base dose is a fixed schedule
    pub fn from_stored(substance: &ProtocolSubstance) -> Result<Self> {
        let definition = if let Some(plan) = non_null(&substance.titration_plan) {
            DosingDefinition::Titration {
                weeks: parse_titration_plan(plan)?,
            }
        } else if let Some(on) = substance.cycle_on_weeks {
            let (dose, unit, frequency) = base_dosing(substance)?;
            DosingDefinition::Cycling {
                dose,
                unit,
                frequency,
                cycle_on_weeks: cycle_length(on, "cycleOnWeeks")?,
                cycle_off_weeks: cycle_length(substance.cycle_off_weeks.unwrap_or(0), "cycleOffWeeks")?,
            }
        } else {
            let (dose, unit, frequency) = base_dosing(substance)?;
            DosingDefinition::Fixed {
                dose,
                unit,
                frequency,
            }
        };

        definition.validate()?;
        tracing::debug!(
            "Built {} definition for substance {}",
            definition.shape_name(),
            substance.substance_id
        );
        Ok(definition)
    }

    /// Check the well-formedness invariants
    pub fn validate(&self) -> Result<()> {
        match self {
            DosingDefinition::Fixed { dose, .. } => validate_dose(*dose),
            DosingDefinition::Titration { weeks } => validate_weeks(weeks),
            DosingDefinition::Cycling {
                dose,
                cycle_on_weeks,
                ..
            } => {
                validate_dose(*dose)?;
                if *cycle_on_weeks == 0 {
                    return Err(Error::InvalidDefinition(
                        "cycleOnWeeks must be at least 1".into(),
                    ));
                }
                Ok(())
            }
        }
    }

    pub fn shape_name(&self) -> &'static str {
        match self {
            DosingDefinition::Fixed { .. } => "fixed",
            DosingDefinition::Titration { .. } => "titration",
            DosingDefinition::Cycling { .. } => "cycling",
        }
    }
}

fn non_null(value: &Option<serde_json::Value>) -> Option<&serde_json::Value> {
    value.as_ref().filter(|v| !v.is_null())
}

fn base_dosing(substance: &ProtocolSubstance) -> Result<(Decimal, String, FrequencyCode)> {
    let dose = substance.dose.ok_or_else(|| {
        Error::InvalidDefinition(format!(
            "Substance {} has no dose",
            substance.substance_id
        ))
    })?;
    let unit = substance.dose_unit.clone().ok_or_else(|| {
        Error::InvalidDefinition(format!(
            "Substance {} has no dose unit",
            substance.substance_id
        ))
    })?;
    let frequency = substance
        .frequency
        .as_deref()
        .ok_or_else(|| {
            Error::InvalidDefinition(format!(
                "Substance {} has no frequency",
                substance.substance_id
            ))
        })?
        .parse()?;

    Ok((dose, unit, frequency))
}

fn cycle_length(value: i64, field: &str) -> Result<u32> {
    u32::try_from(value)
        .map_err(|_| Error::InvalidDefinition(format!("{} must not be negative: {}", field, value)))
}

fn validate_dose(dose: Decimal) -> Result<()> {
    if dose <= Decimal::ZERO {
        return Err(Error::InvalidDefinition(format!(
            "Dose must be positive, got {}",
            dose
        )));
    }
    Ok(())
}

/// Titration weeks must be non-empty, start at 1 or later, and strictly ascend
fn validate_weeks(weeks: &[WeekEntry]) -> Result<()> {
    if weeks.is_empty() {
        return Err(Error::InvalidDefinition(
            "Titration plan has no weeks".into(),
        ));
    }

    for entry in weeks {
        if entry.week_number == 0 {
            return Err(Error::InvalidDefinition(
                "Titration week numbers are 1-based".into(),
            ));
        }
        validate_dose(entry.dose)?;
    }

    if let Some(pair) = weeks
        .windows(2)
        .find(|pair| pair[1].week_number <= pair[0].week_number)
    {
        let reason = if pair[1].week_number == pair[0].week_number {
            "duplicate"
        } else {
            "unsorted"
        };
        return Err(Error::InvalidDefinition(format!(
            "Titration plan has {} week number {}",
            reason, pair[1].week_number
        )));
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn fixed_substance() -> ProtocolSubstance {
        ProtocolSubstance {
            substance_id: "bpc157".into(),
            substance_name: "BPC-157".into(),
            dose: Some(Decimal::from(250)),
            dose_unit: Some("mcg".into()),
            frequency: Some("2x_daily".into()),
            ..Default::default()
        }
    }

    #[test]
    fn test_fixed_from_stored() {
        let def = DosingDefinition::from_stored(&fixed_substance()).unwrap();
        assert_eq!(
            def,
            DosingDefinition::Fixed {
                dose: Decimal::from(250),
                unit: "mcg".into(),
                frequency: FrequencyCode::TwiceDaily,
            }
        );
    }

    #[test]
    fn test_cycling_from_stored_defaults_off_weeks() {
        let mut sub = fixed_substance();
        sub.cycle_on_weeks = Some(6);

        let def = DosingDefinition::from_stored(&sub).unwrap();
        assert!(matches!(
            def,
            DosingDefinition::Cycling {
                cycle_on_weeks: 6,
                cycle_off_weeks: 0,
                ..
            }
        ));
    }

    #[test]
    fn test_zero_cycle_on_weeks_rejected() {
        let mut sub = fixed_substance();
        sub.cycle_on_weeks = Some(0);
        sub.cycle_off_weeks = Some(4);

        let result = DosingDefinition::from_stored(&sub);
        assert!(matches!(result, Err(Error::InvalidDefinition(_))));
    }

    #[test]
    fn test_negative_cycle_off_weeks_rejected() {
        let mut sub = fixed_substance();
        sub.cycle_on_weeks = Some(4);
        sub.cycle_off_weeks = Some(-1);

        assert!(DosingDefinition::from_stored(&sub).is_err());
    }

    #[test]
    fn test_titration_takes_precedence() {
        let mut sub = fixed_substance();
        sub.cycle_on_weeks = Some(4);
        sub.titration_plan = Some(json!({
            "weeks": [
                { "week": 1, "dose": 0.25, "unit": "mg", "frequency": "weekly" },
                { "week": 5, "dose": "0.5", "unit": "mg", "frequency": "weekly", "notes": "step up" }
            ]
        }));

        let def = DosingDefinition::from_stored(&sub).unwrap();
        match def {
            DosingDefinition::Titration { weeks } => {
                assert_eq!(weeks.len(), 2);
                assert_eq!(weeks[0].dose, Decimal::new(25, 2));
                assert_eq!(weeks[1].dose, Decimal::new(5, 1));
                assert_eq!(weeks[1].note.as_deref(), Some("step up"));
            }
            other => panic!("Expected titration, got {:?}", other),
        }
    }

    #[test]
    fn test_titration_plan_as_encoded_string() {
        let plan = json!(
            r#"{"weeks":[{"week":1,"dose":250,"unit":"mcg","frequency":"2x_daily"}]}"#
        );
        let weeks = parse_titration_plan(&plan).unwrap();
        assert_eq!(weeks[0].frequency, FrequencyCode::TwiceDaily);
    }

    #[test]
    fn test_null_titration_plan_falls_back_to_fixed() {
        let mut sub = fixed_substance();
        sub.titration_plan = Some(serde_json::Value::Null);

        let def = DosingDefinition::from_stored(&sub).unwrap();
        assert_eq!(def.shape_name(), "fixed");
    }

    #[test]
    fn test_unsorted_titration_rejected() {
        let plan = json!({
            "weeks": [
                { "week": 3, "dose": 1, "unit": "mg", "frequency": "weekly" },
                { "week": 2, "dose": 1, "unit": "mg", "frequency": "weekly" }
            ]
        });
        let err = parse_titration_plan(&plan).unwrap_err();
        assert!(err.to_string().contains("unsorted"));
    }

    #[test]
    fn test_duplicate_titration_week_rejected() {
        let plan = json!({
            "weeks": [
                { "week": 2, "dose": 1, "unit": "mg", "frequency": "weekly" },
                { "week": 2, "dose": 2, "unit": "mg", "frequency": "weekly" }
            ]
        });
        let err = parse_titration_plan(&plan).unwrap_err();
        assert!(err.to_string().contains("duplicate"));
    }

    #[test]
    fn test_titration_rejects_bad_rows() {
        let zero_week = json!({
            "weeks": [{ "week": 0, "dose": 1, "unit": "mg", "frequency": "weekly" }]
        });
        assert!(parse_titration_plan(&zero_week).is_err());

        let zero_dose = json!({
            "weeks": [{ "week": 1, "dose": 0, "unit": "mg", "frequency": "weekly" }]
        });
        assert!(parse_titration_plan(&zero_dose).is_err());

        let bad_freq = json!({
            "weeks": [{ "week": 1, "dose": 1, "unit": "mg", "frequency": "hourly" }]
        });
        assert!(parse_titration_plan(&bad_freq).is_err());

        assert!(parse_titration_plan(&json!({ "weeks": [] })).is_err());
        assert!(parse_titration_plan(&json!({ "steps": [] })).is_err());
    }

    #[test]
    fn test_missing_fixed_fields_rejected() {
        let mut sub = fixed_substance();
        sub.frequency = None;
        assert!(matches!(
            DosingDefinition::from_stored(&sub),
            Err(Error::InvalidDefinition(_))
        ));

        let mut sub = fixed_substance();
        sub.dose = Some(Decimal::ZERO);
        assert!(DosingDefinition::from_stored(&sub).is_err());
    }
}
