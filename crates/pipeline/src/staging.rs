//! Scoped reset of the directories a prediction works in.
//!
//! [`StagingArea::acquire`] serializes predictions, clears the backend
//! queue, and starts every run from empty input, output and temp
//! directories. [`StagingGuard::release`] clears inputs and temp files
//! once the run is done; outputs stay for the caller to read. A guard
//! dropped without release (an early error return) clears them
//! synchronously instead.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use styler_core::backend::ExecutionBackend;
use styler_core::error::CoreError;
use tokio::sync::{Mutex, MutexGuard};

pub struct StagingArea {
    backend: Arc<dyn ExecutionBackend>,
    input_dir: PathBuf,
    output_dir: PathBuf,
    temp_dir: PathBuf,
    lock: Mutex<()>,
}

/// Exclusive use of the staging directories for one prediction.
pub struct StagingGuard<'a> {
    area: &'a StagingArea,
    released: bool,
    _lock: MutexGuard<'a, ()>,
}

impl StagingArea {
    pub fn new(
        backend: Arc<dyn ExecutionBackend>,
        input_dir: PathBuf,
        output_dir: PathBuf,
        temp_dir: PathBuf,
    ) -> Self {
        Self {
            backend,
            input_dir,
            output_dir,
            temp_dir,
            lock: Mutex::new(()),
        }
    }

    /// Wait for any running prediction, then reset all directories.
    pub async fn acquire(&self) -> Result<StagingGuard<'_>, CoreError> {
        let lock = self.lock.lock().await;

        self.backend.clear_queue().await?;

        for dir in [&self.input_dir, &self.output_dir, &self.temp_dir] {
            reset_dir(dir).await?;
        }

        tracing::debug!(
            input = %self.input_dir.display(),
            output = %self.output_dir.display(),
            "Staging directories reset",
        );

        Ok(StagingGuard {
            area: self,
            released: false,
            _lock: lock,
        })
    }
}

impl StagingGuard<'_> {
    pub fn input_dir(&self) -> &Path {
        &self.area.input_dir
    }

    pub fn output_dir(&self) -> &Path {
        &self.area.output_dir
    }

    pub fn temp_dir(&self) -> &Path {
        &self.area.temp_dir
    }

    /// Clear inputs and temp files, then let the next prediction in.
    pub async fn release(mut self) -> Result<(), CoreError> {
        self.released = true;
        for dir in [&self.area.input_dir, &self.area.temp_dir] {
            clear_dir(dir).await?;
        }
        Ok(())
    }
}

impl Drop for StagingGuard<'_> {
    fn drop(&mut self) {
        if self.released {
            return;
        }
        for dir in [&self.area.input_dir, &self.area.temp_dir] {
            if let Err(e) = clear_dir_sync(dir) {
                tracing::warn!(dir = %dir.display(), error = %e, "Failed to clear staging directory");
            }
        }
    }
}

async fn reset_dir(dir: &Path) -> Result<(), CoreError> {
    match tokio::fs::remove_dir_all(dir).await {
        Ok(()) => {}
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
        Err(e) => return Err(e.into()),
    }
    tokio::fs::create_dir_all(dir).await?;
    Ok(())
}

/// Remove everything inside `dir`, keeping the directory itself.
async fn clear_dir(dir: &Path) -> Result<(), CoreError> {
    let mut entries = match tokio::fs::read_dir(dir).await {
        Ok(entries) => entries,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(()),
        Err(e) => return Err(e.into()),
    };
    while let Some(entry) = entries.next_entry().await? {
        let path = entry.path();
        if entry.file_type().await?.is_dir() {
            tokio::fs::remove_dir_all(&path).await?;
        } else {
            tokio::fs::remove_file(&path).await?;
        }
    }
    Ok(())
}

fn clear_dir_sync(dir: &Path) -> std::io::Result<()> {
    let entries = match std::fs::read_dir(dir) {
        Ok(entries) => entries,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(()),
        Err(e) => return Err(e),
    };
    for entry in entries {
        let path = entry?.path();
        if path.is_dir() {
            std::fs::remove_dir_all(&path)?;
        } else {
            std::fs::remove_file(&path)?;
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use styler_core::graph::WorkflowGraph;

    #[derive(Default)]
    struct CountingBackend {
        clears: AtomicUsize,
    }

    #[async_trait]
    impl ExecutionBackend for CountingBackend {
        async fn connect(&self) -> Result<(), CoreError> {
            Ok(())
        }
        async fn run_workflow(&self, _graph: &WorkflowGraph) -> Result<(), CoreError> {
            Ok(())
        }
        async fn clear_queue(&self) -> Result<(), CoreError> {
            self.clears.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
    }

    fn area(root: &Path, backend: Arc<CountingBackend>) -> StagingArea {
        StagingArea::new(
            backend,
            root.join("in"),
            root.join("out"),
            root.join("tmp"),
        )
    }

    #[tokio::test]
    async fn acquire_creates_empty_dirs_and_clears_queue() {
        let root = tempfile::tempdir().unwrap();
        std::fs::create_dir_all(root.path().join("out")).unwrap();
        std::fs::write(root.path().join("out/stale.png"), b"x").unwrap();

        let backend = Arc::new(CountingBackend::default());
        let staging = area(root.path(), backend.clone());
        let guard = staging.acquire().await.unwrap();

        assert!(guard.input_dir().is_dir());
        assert!(guard.temp_dir().is_dir());
        assert_eq!(std::fs::read_dir(guard.output_dir()).unwrap().count(), 0);
        assert_eq!(backend.clears.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn release_clears_inputs_and_frees_the_lock() {
        let root = tempfile::tempdir().unwrap();
        let staging = area(root.path(), Arc::new(CountingBackend::default()));

        let guard = staging.acquire().await.unwrap();
        std::fs::write(guard.input_dir().join("image.png"), b"x").unwrap();
        std::fs::create_dir_all(guard.temp_dir().join("nested")).unwrap();
        std::fs::write(guard.output_dir().join("result.png"), b"x").unwrap();
        guard.release().await.unwrap();

        assert_eq!(std::fs::read_dir(root.path().join("in")).unwrap().count(), 0);
        assert_eq!(std::fs::read_dir(root.path().join("tmp")).unwrap().count(), 0);
        assert!(root.path().join("out/result.png").exists());

        // The next acquire does not wait on the released guard.
        staging.acquire().await.unwrap().release().await.unwrap();
    }

    #[tokio::test]
    async fn drop_clears_inputs_but_keeps_outputs() {
        let root = tempfile::tempdir().unwrap();
        let staging = area(root.path(), Arc::new(CountingBackend::default()));

        {
            let guard = staging.acquire().await.unwrap();
            std::fs::write(guard.input_dir().join("image.png"), b"x").unwrap();
            std::fs::create_dir_all(guard.temp_dir().join("nested")).unwrap();
            std::fs::write(guard.output_dir().join("result.png"), b"x").unwrap();
        }

        assert_eq!(std::fs::read_dir(root.path().join("in")).unwrap().count(), 0);
        assert_eq!(std::fs::read_dir(root.path().join("tmp")).unwrap().count(), 0);
        assert!(root.path().join("out/result.png").exists());
    }
}
