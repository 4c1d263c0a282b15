use std::{fs::File, io::Read, path::Path};

use csv::StringRecord;
use meter_client::domain::{serde_time, CounterId};
use time::Date;

use crate::{error::EngineError, validation::FormInput};

/// A reading batch prepared offline, as the form would have produced it.
#[derive(Debug, Clone, PartialEq)]
pub struct BatchFile {
    pub input: FormInput,
    /// Effective date shared by every row, when the file carries one.
    pub date: Option<Date>,
}

fn column<'r>(
    record: &'r StringRecord,
    headers: &StringRecord,
    name: &str,
) -> Option<&'r str> {
    headers
        .iter()
        .position(|h| h == name)
        .and_then(|idx| record.get(idx))
}

/// Read `counter_id,value[,date]` rows.
///
/// Values stay raw text so the validator reports bad input the same way it
/// does for the form. A counter may appear once, and all dated rows must
/// agree on the date.
pub fn parse_batch<R: Read>(reader: R) -> Result<BatchFile, EngineError> {
    let mut rdr = csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .from_reader(reader);
    let headers = rdr
        .headers()
        .map_err(|e| EngineError::Intake(format!("failed to read CSV headers: {e}")))?
        .clone();
    for required in ["counter_id", "value"] {
        if !headers.iter().any(|h| h == required) {
            return Err(EngineError::Intake(format!("missing column '{required}'")));
        }
    }

    let mut input = FormInput::new();
    let mut date: Option<Date> = None;

    for (line, result) in rdr.records().enumerate() {
        let record =
            result.map_err(|e| EngineError::Intake(format!("failed to read CSV record: {e}")))?;
        let row = line + 2;

        let raw_id = column(&record, &headers, "counter_id").unwrap_or("");
        let counter_id: CounterId = raw_id
            .parse()
            .map_err(|_| EngineError::Intake(format!("row {row}: invalid counter_id '{raw_id}'")))?;

        let value = column(&record, &headers, "value").unwrap_or("").to_string();
        if input.insert(counter_id, value).is_some() {
            metrics::counter!("reading_intake_rejected_total").increment(1);
            return Err(EngineError::Intake(format!(
                "row {row}: counter {counter_id} appears more than once"
            )));
        }

        if let Some(raw) = column(&record, &headers, "date").filter(|d| !d.is_empty()) {
            let parsed = serde_time::parse_date(raw)
                .map_err(|e| EngineError::Intake(format!("row {row}: invalid date '{raw}': {e}")))?;
            match date {
                Some(seen) if seen != parsed => {
                    return Err(EngineError::Intake(format!(
                        "row {row}: date {parsed} differs from {seen}; one batch has one date"
                    )));
                }
                _ => date = Some(parsed),
            }
        }
    }

    tracing::debug!(rows = input.len(), ?date, "parsed reading batch file");
    Ok(BatchFile { input, date })
}

pub fn read_batch_file(path: impl AsRef<Path>) -> Result<BatchFile, EngineError> {
    let path = path.as_ref();
    let file = File::open(path)
        .map_err(|e| EngineError::Intake(format!("failed to open {}: {e}", path.display())))?;
    parse_batch(file)
}
