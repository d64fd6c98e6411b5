//! Report sinks

use crate::{ReportError, SiteLayout, Uploader};
use approach_registry::{ApproachId, LedVector, VehicleCounts};
use async_trait::async_trait;
use serde::Serialize;
use std::sync::Arc;
use tracing::warn;

/// Snapshot of one approach published each scheduler cycle.
#[derive(Debug, Clone, Copy, Serialize)]
pub struct ApproachReport {
    pub id: ApproachId,
    /// Stamp of the frame the counts were derived from; zero before the
    /// first upload.
    pub stamp: i64,
    pub counts: VehicleCounts,
    pub leds: LedVector,
}

impl ApproachReport {
    /// Space-separated record written to `<approach>.txt`:
    /// `stamp front back side led0 led1 led2 led3`.
    fn to_record(self) -> String {
        let f = self.leds.as_flags();
        format!(
            "{} {} {} {} {} {} {} {}",
            self.stamp,
            self.counts.front,
            self.counts.back,
            self.counts.side,
            f[0],
            f[1],
            f[2],
            f[3],
        )
    }
}

/// Destination for scheduler snapshots and decisions.
#[async_trait]
pub trait ReportSink: Send + Sync {
    /// Publish one approach's snapshot.
    async fn publish_approach(&self, report: ApproachReport) -> Result<(), ReportError>;

    /// Publish the aggregated signal decision:
    /// `accident remaining total`.
    async fn publish_decision(
        &self,
        accident: bool,
        remaining_secs: i64,
        total_secs: i64,
    ) -> Result<(), ReportError>;
}

/// Writes reports into the site layout and optionally forwards the
/// artifacts to an uploader.
///
/// Upload failures are logged and swallowed; a missing dashboard must
/// not take the intersection down. Local write failures propagate so
/// the caller can log them per tick.
pub struct FsReporter {
    layout: SiteLayout,
    uploader: Option<Arc<dyn Uploader>>,
}

impl FsReporter {
    pub fn new(layout: SiteLayout, uploader: Option<Arc<dyn Uploader>>) -> Self {
        Self { layout, uploader }
    }

    async fn forward(&self, path: &std::path::Path) {
        if let Some(uploader) = &self.uploader {
            if let Err(e) = uploader.upload(path).await {
                warn!(path = %path.display(), error = %e, "artifact upload failed");
            }
        }
    }
}

#[async_trait]
impl ReportSink for FsReporter {
    async fn publish_approach(&self, report: ApproachReport) -> Result<(), ReportError> {
        let path = self.layout.approach_report_path(report.id);
        tokio::fs::write(&path, report.to_record()).await?;

        // the annotated image exists only after a detection pass wrote it
        let result_image = self.layout.result_image_path(report.id, report.stamp);
        if tokio::fs::try_exists(&result_image).await.unwrap_or(false) {
            self.forward(&result_image).await;
        }
        self.forward(&path).await;
        Ok(())
    }

    async fn publish_decision(
        &self,
        accident: bool,
        remaining_secs: i64,
        total_secs: i64,
    ) -> Result<(), ReportError> {
        let path = self.layout.global_report_path();
        let record = format!("{} {} {}", accident as u8, remaining_secs, total_secs);
        tokio::fs::write(&path, record).await?;
        self.forward(&path).await;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn report() -> ApproachReport {
        ApproachReport {
            id: ApproachId::East,
            stamp: 1_700_000_000,
            counts: VehicleCounts {
                front: 4,
                back: 2,
                side: 1,
                accident: 0,
            },
            leds: LedVector::GREEN,
        }
    }

    #[test]
    fn approach_record_format() {
        assert_eq!(report().to_record(), "1700000000 4 2 1 1 0 0 0");
    }

    #[tokio::test]
    async fn approach_report_written_to_site_dir() {
        let dir = tempfile::tempdir().unwrap();
        let layout = SiteLayout::new(dir.path(), "1");
        layout.ensure().await.unwrap();

        let reporter = FsReporter::new(layout.clone(), None);
        reporter.publish_approach(report()).await.unwrap();

        let written = tokio::fs::read_to_string(layout.approach_report_path(ApproachId::East))
            .await
            .unwrap();
        assert_eq!(written, "1700000000 4 2 1 1 0 0 0");
    }

    #[tokio::test]
    async fn decision_record_overwrites_global_file() {
        let dir = tempfile::tempdir().unwrap();
        let layout = SiteLayout::new(dir.path(), "1");
        layout.ensure().await.unwrap();

        let reporter = FsReporter::new(layout.clone(), None);
        reporter.publish_decision(false, 17, 25).await.unwrap();
        reporter.publish_decision(true, 3, 5).await.unwrap();

        let written = tokio::fs::read_to_string(layout.global_report_path())
            .await
            .unwrap();
        assert_eq!(written, "1 3 5");
    }

    #[tokio::test]
    async fn missing_site_dir_is_a_local_write_error() {
        let dir = tempfile::tempdir().unwrap();
        let layout = SiteLayout::new(dir.path().join("absent"), "1");
        let reporter = FsReporter::new(layout, None);
        assert!(matches!(
            reporter.publish_decision(false, 0, 0).await,
            Err(ReportError::Io(_))
        ));
    }
}
