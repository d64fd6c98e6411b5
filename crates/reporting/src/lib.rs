//! Reporting Bridge
//!
//! Persists scheduler snapshots in the site file layout shared with the
//! detection engine and the external dashboard, and optionally forwards
//! the written artifacts to a remote endpoint. Reporting failures are
//! never fatal to the control loop; the current tick's values simply go
//! stale.

mod layout;
mod sink;
mod upload;

pub use layout::SiteLayout;
pub use sink::{ApproachReport, FsReporter, ReportSink};
pub use upload::{HttpUploader, Uploader};

use thiserror::Error;

/// Reporting errors.
#[derive(Debug, Error)]
pub enum ReportError {
    /// Local file write failed.
    #[error("report write failed: {0}")]
    Io(#[from] std::io::Error),

    /// Remote endpoint refused or was unreachable.
    #[error("artifact upload failed: {0}")]
    Upload(String),
}
