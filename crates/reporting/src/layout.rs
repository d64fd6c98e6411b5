//! Site file layout
//!
//! Frames and reports live under a root directory, namespaced by site
//! identifier, then by approach identity and frame stamp:
//!
//! ```text
//! <root>/<site-id>/<approach><stamp>.jpg          stored frame
//! <root>/<site-id>/<approach><stamp>_result.jpg   annotated detection output
//! <root>/<site-id>/<approach>.txt                 latest approach report
//! <root>/<site-id>/global.txt                     latest signal decision
//! ```
//!
//! These shapes are the join contract with the detection engine and the
//! reporting endpoint; nothing else may derive them independently.

use approach_registry::ApproachId;
use std::path::{Path, PathBuf};

/// Path builder for one site's storage directory.
#[derive(Debug, Clone)]
pub struct SiteLayout {
    root: PathBuf,
    site_id: String,
}

impl SiteLayout {
    pub fn new(root: impl Into<PathBuf>, site_id: impl Into<String>) -> Self {
        Self {
            root: root.into(),
            site_id: site_id.into(),
        }
    }

    /// Site identifier this layout namespaces under.
    pub fn site_id(&self) -> &str {
        &self.site_id
    }

    /// The site's storage directory.
    pub fn site_dir(&self) -> PathBuf {
        self.root.join(&self.site_id)
    }

    /// Create the site directory if missing. Must run before the
    /// listener accepts uploads; frame files cannot be created
    /// otherwise.
    pub async fn ensure(&self) -> std::io::Result<()> {
        tokio::fs::create_dir_all(self.site_dir()).await
    }

    /// Stored frame for an approach at a given stamp.
    pub fn frame_path(&self, id: ApproachId, stamp: i64) -> PathBuf {
        self.site_dir().join(format!("{id}{stamp}.jpg"))
    }

    /// Annotated detection output for a frame.
    pub fn result_image_path(&self, id: ApproachId, stamp: i64) -> PathBuf {
        self.site_dir().join(format!("{id}{stamp}_result.jpg"))
    }

    /// Latest per-approach report file.
    pub fn approach_report_path(&self, id: ApproachId) -> PathBuf {
        self.site_dir().join(format!("{id}.txt"))
    }

    /// Latest aggregated signal decision.
    pub fn global_report_path(&self) -> PathBuf {
        self.site_dir().join("global.txt")
    }

    /// Root directory the site lives under.
    pub fn root(&self) -> &Path {
        &self.root
    }
}
