//! Delivery of a completed submission to the record log, the channel and email.

pub mod pipeline;
pub mod sinks;
pub mod spreadsheet;
pub mod summary;
pub mod table;

pub use pipeline::{ExportPipeline, ExportReport, ExportVerdict, SinkKind, SinkOutcome, SinkReport};
pub use sinks::{ChannelPublisher, FileUpload, MailAttachment, MailTransport, OutboundMail, SinkError};
pub use spreadsheet::{
    build_workbook, workbook_from_log, ExportError, WorkbookArtifact, WorkbookError,
    XLSX_CONTENT_TYPE,
};
pub use summary::{format_amount, SummaryRenderer};
pub use table::{submission_row, CsvLog, COLUMNS};
