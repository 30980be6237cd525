//! CSV export of resolved schedules.

use crate::{Result, ScheduleEvent};
use std::fs::File;
use std::path::Path;

/// A row in the CSV output
#[derive(Debug, serde::Serialize)]
struct CsvRow {
    date: String,
    substance_id: String,
    substance_name: String,
    dose: String,
    unit: Option<String>,
    frequency: Option<String>,
    ordinal: u8,
    note: Option<String>,
}

impl From<&ScheduleEvent> for CsvRow {
    fn from(event: &ScheduleEvent) -> Self {
        CsvRow {
            date: event.date.to_string(),
            substance_id: event.substance_id.clone(),
            substance_name: event.substance_name.clone(),
            dose: event.dose.to_string(),
            unit: event.unit.clone(),
            frequency: event.frequency.map(|f| f.to_string()),
            ordinal: event.ordinal,
            note: event.note.clone(),
        }
    }
}

/// Write a schedule to a CSV file, replacing any existing file
///
/// The file is flushed and synced before returning. Returns the number of
/// rows written.
pub fn write_schedule_csv(events: &[ScheduleEvent], path: &Path) -> Result<usize> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }

    let file = File::create(path)?;
    let mut writer = csv::WriterBuilder::new()
        .has_headers(true)
        .from_writer(file);

    for event in events {
        writer.serialize(CsvRow::from(event))?;
    }

    writer.flush()?;
    let file = writer
        .into_inner()
        .map_err(|e| std::io::Error::new(std::io::ErrorKind::Other, e.to_string()))?;
    file.sync_all()?;

    tracing::info!("Exported {} schedule rows to {:?}", events.len(), path);
    Ok(events.len())
}
