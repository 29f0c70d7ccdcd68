use std::fs::OpenOptions;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use tokio::sync::Mutex;

use crate::domain::submission::{FormField, Submission};
use crate::export::sinks::SinkError;

/// Column order of the record log and of every exported workbook.
pub const COLUMNS: [&str; 8] = [
    "Timestamp",
    "User ID",
    "Name",
    "Reason",
    "Amount",
    "Account Number",
    "Account Name",
    "Bank Name",
];

pub fn submission_row(submission: &Submission) -> Vec<String> {
    let mut row = Vec::with_capacity(COLUMNS.len());
    row.push(submission.timestamp_label());
    row.push(submission.user_id.to_string());
    row.extend(FormField::ORDERED.into_iter().map(|field| submission.field(field).to_owned()));
    row
}

/// Append-only CSV file holding one row per completed submission.
#[derive(Clone, Debug)]
pub struct CsvLog {
    path: PathBuf,
    // appends from different users must not interleave the header check
    write_lock: Arc<Mutex<()>>,
}

impl CsvLog {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into(), write_lock: Arc::new(Mutex::new(())) }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub async fn append(&self, submission: &Submission) -> Result<(), SinkError> {
        let _guard = self.write_lock.lock().await;
        let path = self.path.clone();
        let row = submission_row(submission);

        tokio::task::spawn_blocking(move || append_row(&path, &row))
            .await
            .map_err(|error| SinkError::Io(format!("append task failed: {error}")))?
    }

    /// Every data row in the log, header excluded. A missing file reads as empty.
    pub async fn read_all(&self) -> Result<Vec<Vec<String>>, SinkError> {
        let path = self.path.clone();
        tokio::task::spawn_blocking(move || read_rows(&path))
            .await
            .map_err(|error| SinkError::Io(format!("read task failed: {error}")))?
    }
}

fn append_row(path: &Path, row: &[String]) -> Result<(), SinkError> {
    if let Some(parent) = path.parent().filter(|parent| !parent.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent).map_err(|error| io_error(path, error))?;
    }

    let file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .map_err(|error| io_error(path, error))?;
    let needs_header = file.metadata().map_err(|error| io_error(path, error))?.len() == 0;

    let mut writer = csv::WriterBuilder::new().has_headers(false).from_writer(file);
    if needs_header {
        writer.write_record(COLUMNS).map_err(|error| csv_error(path, error))?;
    }
    writer.write_record(row).map_err(|error| csv_error(path, error))?;
    writer.flush().map_err(|error| io_error(path, error))
}

fn read_rows(path: &Path) -> Result<Vec<Vec<String>>, SinkError> {
    if !path.exists() {
        return Ok(Vec::new());
    }

    let mut reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .from_path(path)
        .map_err(|error| csv_error(path, error))?;

    let mut rows = Vec::new();
    for record in reader.records() {
        let record = record.map_err(|error| csv_error(path, error))?;
        rows.push(record.iter().map(str::to_owned).collect());
    }
    Ok(rows)
}

fn io_error(path: &Path, error: std::io::Error) -> SinkError {
    SinkError::Io(format!("{}: {error}", path.display()))
}

fn csv_error(path: &Path, error: csv::Error) -> SinkError {
    SinkError::Io(format!("{}: {error}", path.display()))
}
