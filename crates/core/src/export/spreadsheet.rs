use rust_xlsxwriter::{Format, Workbook, XlsxError};
use thiserror::Error;

use crate::export::sinks::SinkError;
use crate::export::table::{CsvLog, COLUMNS};

pub const XLSX_CONTENT_TYPE: &str =
    "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet";

const SHEET_NAME: &str = "Payments";

#[derive(Debug, Error)]
pub enum WorkbookError {
    #[error("workbook has {found} columns in row {row}, expected at most {expected}")]
    RowTooWide { row: usize, found: usize, expected: usize },
    #[error("workbook rendering failed: {0}")]
    Render(#[from] XlsxError),
}

/// Failure to turn the whole record log into a workbook.
#[derive(Debug, Error)]
pub enum ExportError {
    #[error("could not read the record log: {0}")]
    Read(#[from] SinkError),
    #[error("the record log at `{0}` has no submissions")]
    Empty(String),
    #[error(transparent)]
    Workbook(#[from] WorkbookError),
}

/// An in-memory `.xlsx` file ready to upload or attach.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct WorkbookArtifact {
    pub file_name: String,
    pub bytes: Vec<u8>,
}

pub fn build_workbook(
    file_name: &str,
    headers: &[&str],
    rows: &[Vec<String>],
) -> Result<WorkbookArtifact, WorkbookError> {
    let mut workbook = Workbook::new();
    let header_format = Format::new().set_bold();
    let worksheet = workbook.add_worksheet();
    worksheet.set_name(SHEET_NAME)?;

    for (col, header) in headers.iter().enumerate() {
        worksheet.write_string_with_format(0, col as u16, *header, &header_format)?;
    }

    for (index, row) in rows.iter().enumerate() {
        if row.len() > headers.len() {
            return Err(WorkbookError::RowTooWide {
                row: index + 1,
                found: row.len(),
                expected: headers.len(),
            });
        }
        for (col, value) in row.iter().enumerate() {
            worksheet.write_string((index + 1) as u32, col as u16, value)?;
        }
    }
    worksheet.autofit();

    let bytes = workbook.save_to_buffer()?;
    Ok(WorkbookArtifact { file_name: file_name.to_owned(), bytes })
}

/// Every row of the record log as one workbook.
pub async fn workbook_from_log(
    log: &CsvLog,
    file_name: &str,
) -> Result<WorkbookArtifact, ExportError> {
    let rows = log.read_all().await?;
    if rows.is_empty() {
        return Err(ExportError::Empty(log.path().display().to_string()));
    }
    Ok(build_workbook(file_name, &COLUMNS, &rows)?)
}
