use std::collections::HashMap;
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;

use flate2::bufread::GzDecoder;
use serde::{Deserialize, Serialize};

use super::event_log_struct::{Event, EventLog, Trace};

///
/// Error encountered while importing an event log
///
/// An import either yields a complete [`EventLog`] or one of these errors; partial logs are
/// never returned.
///
#[derive(Debug, thiserror::Error)]
pub enum LogImportError {
    /// IO error
    #[error("Failed to read event log: {0}")]
    IOError(#[from] std::io::Error),
    /// JSON error (e.g., incorrect JSON format or unexpected structure)
    #[error("Failed to parse JSON event log: {0}")]
    JSONParsingError(#[from] serde_json::Error),
    /// CSV error (e.g., inconsistent number of fields)
    #[error("Failed to parse CSV event log: {0}")]
    CSVParsingError(#[from] csv::Error),
    /// The CSV header does not contain the expected column
    #[error("CSV event log has no column named '{0}'")]
    MissingColumn(String),
    /// The file extension does not belong to a supported format
    #[error("Unsupported event log format: '{0}' (expected .json, .csv or their .gz variants)")]
    UnsupportedFormat(String),
    /// The log does not contain a single activity, so there is no process domain
    #[error("Event log does not contain any activity")]
    NoActivities,
}

/// Supported serialization formats of event logs
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum LogFormat {
    /// JSON serialization of [`EventLog`]
    JSON,
    /// Flat event table, one row per event
    CSV,
}

impl LogFormat {
    /// Determine the format (and whether the file is gzip-compressed) from a file path
    pub fn from_path<P: AsRef<Path>>(path: P) -> Result<(Self, bool), LogImportError> {
        let name = path.as_ref().to_string_lossy().to_lowercase();
        let (stem, is_gz) = match name.strip_suffix(".gz") {
            Some(stem) => (stem, true),
            None => (name.as_str(), false),
        };
        if stem.ends_with(".json") {
            Ok((LogFormat::JSON, is_gz))
        } else if stem.ends_with(".csv") {
            Ok((LogFormat::CSV, is_gz))
        } else {
            Err(LogImportError::UnsupportedFormat(name.clone()))
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
///
/// Options for CSV Import
///
pub struct CSVImportOptions {
    /// Column holding the case identifier
    pub case_column: String,
    /// Column holding the activity label
    pub activity_column: String,
    /// Field delimiter
    pub delimiter: u8,
}

impl Default for CSVImportOptions {
    fn default() -> Self {
        Self {
            case_column: "case:concept:name".to_string(),
            activity_column: "concept:name".to_string(),
            delimiter: b',',
        }
    }
}

/// Parse a JSON [`EventLog`] from the given reader
pub fn import_log_json<T: BufRead>(reader: T) -> Result<EventLog, LogImportError> {
    Ok(serde_json::from_reader(reader)?)
}

/// Parse a CSV event table from the given reader
///
/// Every row is one event. Events are appended to their case in row order; cases appear in the
/// resulting [`EventLog`] in order of their first event.
pub fn import_log_csv<T: BufRead>(
    reader: T,
    options: &CSVImportOptions,
) -> Result<EventLog, LogImportError> {
    let mut csv_reader = csv::ReaderBuilder::new()
        .delimiter(options.delimiter)
        .from_reader(reader);
    let headers = csv_reader.headers()?.clone();
    let column_index = |name: &str| {
        headers
            .iter()
            .position(|h| h == name)
            .ok_or_else(|| LogImportError::MissingColumn(name.to_string()))
    };
    let case_index = column_index(&options.case_column)?;
    let activity_index = column_index(&options.activity_column)?;

    let mut traces: Vec<Trace> = Vec::new();
    let mut case_to_trace: HashMap<String, usize> = HashMap::new();
    for record in csv_reader.records() {
        let record = record?;
        let case_id = record.get(case_index).unwrap_or_default();
        let activity = record.get(activity_index).unwrap_or_default();
        let trace_index = *case_to_trace.entry(case_id.to_string()).or_insert_with(|| {
            traces.push(Trace {
                case_id: case_id.to_string(),
                events: Vec::new(),
            });
            traces.len() - 1
        });
        traces[trace_index].events.push(Event::new(activity));
    }
    Ok(EventLog { traces })
}

///
/// Import a JSON [`EventLog`] from a file path (gzip-compressed if the path ends with `.gz`)
///
pub fn import_log_json_path<P: AsRef<Path>>(path: P) -> Result<EventLog, LogImportError> {
    let file = File::open(&path)?;
    if path.as_ref().to_string_lossy().ends_with(".gz") {
        let dec: GzDecoder<BufReader<File>> = GzDecoder::new(BufReader::new(file));
        import_log_json(BufReader::new(dec))
    } else {
        import_log_json(BufReader::new(file))
    }
}

///
/// Import a CSV [`EventLog`] from a file path (gzip-compressed if the path ends with `.gz`)
///
pub fn import_log_csv_path<P: AsRef<Path>>(
    path: P,
    options: &CSVImportOptions,
) -> Result<EventLog, LogImportError> {
    let file = File::open(&path)?;
    if path.as_ref().to_string_lossy().ends_with(".gz") {
        let dec: GzDecoder<BufReader<File>> = GzDecoder::new(BufReader::new(file));
        import_log_csv(BufReader::new(dec), options)
    } else {
        import_log_csv(BufReader::new(file), options)
    }
}

///
/// Import an [`EventLog`] from a file path, choosing the format by file extension
///
/// CSV files are read with the default [`CSVImportOptions`].
///
pub fn import_log_path<P: AsRef<Path>>(path: P) -> Result<EventLog, LogImportError> {
    match LogFormat::from_path(&path)?.0 {
        LogFormat::JSON => import_log_json_path(path),
        LogFormat::CSV => import_log_csv_path(path, &CSVImportOptions::default()),
    }
}

///
/// Import an [`EventLog`] from a byte slice (&\[u8\])
///
/// * `is_compressed_gz`: Parse the passed `data` as a compressed .gz archive
///
pub fn import_log_slice(
    data: &[u8],
    format: LogFormat,
    is_compressed_gz: bool,
) -> Result<EventLog, LogImportError> {
    if is_compressed_gz {
        let gz: GzDecoder<&[u8]> = GzDecoder::new(data);
        let reader = BufReader::new(gz);
        return match format {
            LogFormat::JSON => import_log_json(reader),
            LogFormat::CSV => import_log_csv(reader, &CSVImportOptions::default()),
        };
    }
    match format {
        LogFormat::JSON => import_log_json(data),
        LogFormat::CSV => import_log_csv(data, &CSVImportOptions::default()),
    }
}
