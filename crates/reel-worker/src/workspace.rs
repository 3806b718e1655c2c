//! Per-job scratch directory.

use std::io;
use std::path::{Path, PathBuf};

use tempfile::TempDir;
use tracing::debug;

/// Directory holding a job's downloads and intermediates.
///
/// Removed by [`JobWorkspace::release`], or on drop if the job bails out
/// before reaching it.
#[derive(Debug)]
pub struct JobWorkspace {
    dir: TempDir,
}

impl JobWorkspace {
    /// Create a fresh workspace under `root`.
    pub fn create(root: impl AsRef<Path>, job_id: &str) -> io::Result<Self> {
        let root = root.as_ref();
        std::fs::create_dir_all(root)?;

        let safe_id: String = job_id
            .chars()
            .filter(|c| c.is_ascii_alphanumeric() || *c == '-' || *c == '_')
            .take(48)
            .collect();

        let dir = tempfile::Builder::new()
            .prefix(&format!("reel-export-{}-", safe_id))
            .tempdir_in(root)?;
        std::fs::create_dir_all(dir.path().join("media"))?;

        debug!("Created job workspace {}", dir.path().display());
        Ok(Self { dir })
    }

    pub fn path(&self) -> &Path {
        self.dir.path()
    }

    /// Downloaded source media.
    pub fn media_dir(&self) -> PathBuf {
        self.dir.path().join("media")
    }

    /// Intermediate for the clip at `index`.
    pub fn clip_path(&self, index: usize) -> PathBuf {
        self.dir.path().join(format!("clip_{:03}.mp4", index))
    }

    /// Output of the compositing stage.
    pub fn merged_path(&self) -> PathBuf {
        self.dir.path().join("merged.mp4")
    }

    /// Final file before it leaves the workspace.
    pub fn output_path(&self, file_name: &str) -> PathBuf {
        self.dir.path().join(file_name)
    }

    /// Remove the workspace and everything in it.
    pub fn release(self) -> io::Result<()> {
        let path = self.dir.path().to_path_buf();
        self.dir.close()?;
        debug!("Released job workspace {}", path.display());
        Ok(())
    }
}
