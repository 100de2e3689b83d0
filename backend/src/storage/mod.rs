//! Source and sink collaborators.
//!
//! The pipeline never talks to storage directly: it is handed a [`Source`] to
//! read the input extracts from and a [`Sink`] to load the output tables into.
//!
//! - [`DirectorySource`] / [`DirectorySink`] - a local directory as the bucket,
//!   another as the warehouse
//! - [`MemorySource`] / [`MemorySink`] - in-memory fakes
//!
//! Sinks receive every table through [`Sink::write`] and then either
//! [`Sink::commit`] or [`Sink::abort`]. A staging sink makes the four tables
//! visible together on commit, or not at all.

use async_trait::async_trait;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use crate::config::WarehouseConfig;
use crate::error::{SinkError, SinkResult, SourceError, SourceResult};
use crate::logs::log_warning;
use crate::models::Table;
use crate::parser::{encode_table, OutputFormat};

/// Object-storage-like source of input files.
#[async_trait]
pub trait Source: Send + Sync {
    /// Names of all available objects.
    async fn catalogue(&self) -> SourceResult<Vec<String>>;

    /// Raw contents of one object.
    async fn read(&self, name: &str) -> SourceResult<Vec<u8>>;
}

/// Warehouse-like sink for output tables.
#[async_trait]
pub trait Sink: Send + Sync {
    /// Persist one table, blocking until it is stored or has failed.
    async fn write(&self, table_name: &str, table: &Table) -> SinkResult<()>;

    /// Make every table written so far visible.
    async fn commit(&self) -> SinkResult<()> {
        Ok(())
    }

    /// Discard every table written since the last commit.
    async fn abort(&self) -> SinkResult<()> {
        Ok(())
    }
}

// =============================================================================
// Directory adapters
// =============================================================================

/// A local directory standing in for a storage bucket.
#[derive(Debug, Clone)]
pub struct DirectorySource {
    root: PathBuf,
}

impl DirectorySource {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    fn object_path(&self, name: &str) -> SourceResult<PathBuf> {
        let plain = !name.is_empty()
            && !name.contains(['/', '\\'])
            && name != "."
            && name != "..";
        if !plain {
            return Err(SourceError::NotFound(name.to_string()));
        }
        Ok(self.root.join(name))
    }
}

#[async_trait]
impl Source for DirectorySource {
    async fn catalogue(&self) -> SourceResult<Vec<String>> {
        let mut entries = tokio::fs::read_dir(&self.root).await.map_err(|e| {
            SourceError::Unavailable(format!("{}: {}", self.root.display(), e))
        })?;

        let mut names = Vec::new();
        while let Some(entry) = entries.next_entry().await? {
            if entry.file_type().await?.is_file() {
                if let Some(name) = entry.file_name().to_str() {
                    names.push(name.to_string());
                }
            }
        }
        names.sort();
        Ok(names)
    }

    async fn read(&self, name: &str) -> SourceResult<Vec<u8>> {
        let path = self.object_path(name)?;
        match tokio::fs::read(&path).await {
            Ok(bytes) => Ok(bytes),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                Err(SourceError::NotFound(name.to_string()))
            }
            Err(e) => Err(e.into()),
        }
    }
}

/// A local directory standing in for a warehouse dataset.
///
/// Tables are staged under `<root>/<dataset>/.staging-<id>/` and moved to
/// `<root>/<dataset>/<table>.<ext>` on commit, replacing earlier loads. If a
/// move fails, the tables already moved are taken back out and the earlier
/// loads restored, so a failed commit leaves the dataset as it was.
#[derive(Debug)]
pub struct DirectorySink {
    dataset_dir: PathBuf,
    staging_dir: PathBuf,
    format: OutputFormat,
    staged: Mutex<Vec<String>>,
}

impl DirectorySink {
    pub fn new(root: impl AsRef<Path>, dataset_id: &str, format: OutputFormat) -> Self {
        let dataset_dir = root.as_ref().join(dataset_id);
        let staging_dir = dataset_dir.join(format!(".staging-{}", uuid::Uuid::new_v4().simple()));
        Self {
            dataset_dir,
            staging_dir,
            format,
            staged: Mutex::new(Vec::new()),
        }
    }

    pub fn from_config(config: &WarehouseConfig) -> Self {
        Self::new(&config.root, &config.dataset_id, config.format)
    }

    pub fn dataset_dir(&self) -> &Path {
        &self.dataset_dir
    }

    /// Final location of a committed table.
    pub fn table_path(&self, table_name: &str) -> PathBuf {
        self.dataset_dir
            .join(format!("{}.{}", table_name, self.format.extension()))
    }

    fn file_name(&self, table_name: &str) -> String {
        format!("{}.{}", table_name, self.format.extension())
    }

    /// Move a staged table into place, parking any earlier load under `backup_dir`.
    async fn swap_in(
        &self,
        file_name: String,
        backup_dir: &Path,
        swaps: &mut Vec<Swap>,
    ) -> std::io::Result<()> {
        let target = self.dataset_dir.join(&file_name);
        let had_previous = tokio::fs::symlink_metadata(&target).await.is_ok();
        if had_previous {
            tokio::fs::rename(&target, backup_dir.join(&file_name)).await?;
        }
        swaps.push(Swap {
            file_name,
            had_previous,
            installed: false,
        });

        let swap = swaps.len() - 1;
        tokio::fs::rename(self.staging_dir.join(&swaps[swap].file_name), &target).await?;
        swaps[swap].installed = true;
        Ok(())
    }

    /// Undo `swaps` in reverse, restoring earlier loads.
    async fn roll_back(&self, swaps: &[Swap], backup_dir: &Path) {
        for swap in swaps.iter().rev() {
            let target = self.dataset_dir.join(&swap.file_name);
            if swap.installed {
                if let Err(e) = tokio::fs::remove_file(&target).await {
                    log_warning(format!("Rollback could not remove {}: {}", target.display(), e));
                }
            }
            if swap.had_previous {
                if let Err(e) = tokio::fs::rename(backup_dir.join(&swap.file_name), &target).await {
                    log_warning(format!("Rollback could not restore {}: {}", target.display(), e));
                }
            }
        }
    }

    fn take_staged(&self) -> Vec<String> {
        match self.staged.lock() {
            Ok(mut staged) => std::mem::take(&mut *staged),
            Err(poisoned) => std::mem::take(&mut *poisoned.into_inner()),
        }
    }
}

#[async_trait]
impl Sink for DirectorySink {
    async fn write(&self, table_name: &str, table: &Table) -> SinkResult<()> {
        let bytes =
            encode_table(table, self.format).map_err(|e| SinkError::Encode(e.to_string()))?;

        tokio::fs::create_dir_all(&self.staging_dir).await?;
        let file_name = self.file_name(table_name);
        tokio::fs::write(self.staging_dir.join(&file_name), bytes).await?;

        if let Ok(mut staged) = self.staged.lock() {
            staged.push(file_name);
        }
        Ok(())
    }

    async fn commit(&self) -> SinkResult<()> {
        let staged = self.take_staged();
        let backup_dir = self.staging_dir.join(".previous");
        if !staged.is_empty() {
            tokio::fs::create_dir_all(&backup_dir).await?;
        }

        let mut swaps = Vec::with_capacity(staged.len());
        for file_name in staged {
            if let Err(e) = self.swap_in(file_name, &backup_dir, &mut swaps).await {
                self.roll_back(&swaps, &backup_dir).await;
                return Err(e.into());
            }
        }

        if tokio::fs::metadata(&self.staging_dir).await.is_ok() {
            tokio::fs::remove_dir_all(&self.staging_dir).await?;
        }
        Ok(())
    }

    async fn abort(&self) -> SinkResult<()> {
        self.take_staged();
        if tokio::fs::metadata(&self.staging_dir).await.is_ok() {
            tokio::fs::remove_dir_all(&self.staging_dir).await?;
        }
        Ok(())
    }
}

/// One table moved into place during a commit.
#[derive(Debug)]
struct Swap {
    file_name: String,
    had_previous: bool,
    installed: bool,
}

// =============================================================================
// In-memory adapters
// =============================================================================

/// Input files held in memory.
#[derive(Debug, Clone, Default)]
pub struct MemorySource {
    files: BTreeMap<String, Vec<u8>>,
}

impl MemorySource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_file(mut self, name: &str, contents: impl Into<Vec<u8>>) -> Self {
        self.insert(name, contents);
        self
    }

    pub fn insert(&mut self, name: &str, contents: impl Into<Vec<u8>>) {
        self.files.insert(name.to_string(), contents.into());
    }
}

#[async_trait]
impl Source for MemorySource {
    async fn catalogue(&self) -> SourceResult<Vec<String>> {
        Ok(self.files.keys().cloned().collect())
    }

    async fn read(&self, name: &str) -> SourceResult<Vec<u8>> {
        self.files
            .get(name)
            .cloned()
            .ok_or_else(|| SourceError::NotFound(name.to_string()))
    }
}

/// Output tables held in memory, with staged/committed separation.
#[derive(Debug, Default)]
pub struct MemorySink {
    staged: Mutex<BTreeMap<String, Table>>,
    committed: Mutex<BTreeMap<String, Table>>,
    writes: Mutex<Vec<String>>,
    fail_on: Option<String>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    /// A sink that rejects any write of `table_name`.
    pub fn failing_on(table_name: &str) -> Self {
        Self {
            fail_on: Some(table_name.to_string()),
            ..Self::default()
        }
    }

    /// Committed tables by name.
    pub fn tables(&self) -> BTreeMap<String, Table> {
        self.committed.lock().map(|t| t.clone()).unwrap_or_default()
    }

    pub fn table(&self, name: &str) -> Option<Table> {
        self.committed.lock().ok().and_then(|t| t.get(name).cloned())
    }

    /// Every table name passed to `write`, in call order.
    pub fn write_log(&self) -> Vec<String> {
        self.writes.lock().map(|w| w.clone()).unwrap_or_default()
    }
}

#[async_trait]
impl Sink for MemorySink {
    async fn write(&self, table_name: &str, table: &Table) -> SinkResult<()> {
        if let Ok(mut writes) = self.writes.lock() {
            writes.push(table_name.to_string());
        }
        if self.fail_on.as_deref() == Some(table_name) {
            return Err(SinkError::Rejected {
                table: table_name.to_string(),
                message: "write rejected by warehouse".to_string(),
            });
        }
        if let Ok(mut staged) = self.staged.lock() {
            staged.insert(table_name.to_string(), table.clone());
        }
        Ok(())
    }

    async fn commit(&self) -> SinkResult<()> {
        let staged = match self.staged.lock() {
            Ok(mut staged) => std::mem::take(&mut *staged),
            Err(_) => return Err(SinkError::Encode("staging area poisoned".to_string())),
        };
        if let Ok(mut committed) = self.committed.lock() {
            committed.extend(staged);
        }
        Ok(())
    }

    async fn abort(&self) -> SinkResult<()> {
        if let Ok(mut staged) = self.staged.lock() {
            staged.clear();
        }
        Ok(())
    }
}
