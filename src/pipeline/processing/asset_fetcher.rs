use crate::app::ports::AssetDownloader;
use crate::error::{FetchError, ImportError, Result};
use crate::types::{ItemCollection, Value};
use indexmap::IndexMap;
use metrics::counter;
use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::{debug, info, instrument, warn};

/// Counts produced by one fetch run
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FetchReport {
    /// Remote references found in asset fields
    pub references: usize,
    /// Network downloads that succeeded
    pub downloaded: usize,
    /// Files already present in the media directory
    pub reused_local: usize,
    /// References attached to a task created earlier in the run
    pub deduplicated: usize,
    /// Downloads that failed, each counted once
    pub failed: usize,
}

/// Where a resolved filename has to be written back
#[derive(Debug, Clone)]
struct Reference {
    identifier: String,
    field: String,
    /// Position inside a list field, `None` for single-valued fields
    index: Option<usize>,
    url: String,
}

#[derive(Debug)]
enum TaskState {
    Local,
    Pending,
    Done(std::result::Result<(), FetchError>),
}

#[derive(Debug)]
struct DownloadTask {
    url: String,
    references: Vec<Reference>,
    state: TaskState,
}

/// List-field entries per (identifier, field), rejoined once every task is settled
type ListTable = HashMap<(String, String), Vec<Option<String>>>;

pub fn is_remote(value: &str) -> bool {
    value.starts_with("http://") || value.starts_with("https://")
}

/// Local filename for a URL: the basename of its path with spaces removed.
pub fn local_filename(url: &str) -> Option<String> {
    let without_fragment = url.split('#').next().unwrap_or(url);
    let path = without_fragment.split('?').next().unwrap_or(without_fragment);
    let rest = path.split_once("://").map(|(_, rest)| rest).unwrap_or(path);
    let (_, url_path) = rest.split_once('/')?;
    let basename = url_path.rsplit('/').next().unwrap_or_default();
    let filename: String = basename.chars().filter(|c| *c != ' ').collect();

    match filename.as_str() {
        "" | "." | ".." => None,
        _ => Some(filename),
    }
}

/// Downloads the remote assets referenced by item fields into a media directory.
pub struct AssetFetcher {
    downloader: Arc<dyn AssetDownloader>,
    media_dir: PathBuf,
}

impl AssetFetcher {
    pub fn new(downloader: Arc<dyn AssetDownloader>, media_dir: impl Into<PathBuf>) -> Self {
        Self {
            downloader,
            media_dir: media_dir.into(),
        }
    }

    pub fn media_dir(&self) -> &Path {
        &self.media_dir
    }

    /// Replaces asset URLs with local filenames, downloading at most `concurrency` at a time.
    ///
    /// A failed download nulls every field of the referencing item that still holds the URL.
    #[instrument(skip(self, items), fields(media_dir = %self.media_dir.display()))]
    pub async fn fetch(
        &self,
        items: &mut ItemCollection,
        fields: &[String],
        list_fields: &[String],
        concurrency: usize,
    ) -> Result<FetchReport> {
        if concurrency == 0 {
            return Err(ImportError::Config(
                "asset fetch concurrency must be at least 1".to_string(),
            ));
        }
        tokio::fs::create_dir_all(&self.media_dir).await?;

        let mut report = FetchReport::default();
        let mut tasks: IndexMap<String, DownloadTask> = IndexMap::new();
        let mut unresolvable: Vec<Reference> = Vec::new();
        let mut lists: ListTable = HashMap::new();

        for (identifier, item) in items.iter() {
            for field in fields {
                if let Some(Value::Text(url)) = item.get(field) {
                    if is_remote(url) {
                        let reference = Reference {
                            identifier: identifier.clone(),
                            field: field.clone(),
                            index: None,
                            url: url.clone(),
                        };
                        self.register(reference, &mut tasks, &mut unresolvable, &mut report)
                            .await;
                    }
                }
            }

            for field in list_fields {
                let Some(value) = item.get(field) else {
                    continue;
                };
                let entries = split_list(value);
                for (index, url) in entries.iter().enumerate() {
                    if let Some(url) = url.as_deref().filter(|u| is_remote(u)) {
                        let reference = Reference {
                            identifier: identifier.clone(),
                            field: field.clone(),
                            index: Some(index),
                            url: url.to_string(),
                        };
                        self.register(reference, &mut tasks, &mut unresolvable, &mut report)
                            .await;
                    }
                }
                lists.insert((identifier.clone(), field.clone()), entries);
            }
        }

        self.download_pending(&mut tasks, concurrency).await;

        for (filename, task) in &tasks {
            match &task.state {
                TaskState::Local | TaskState::Done(Ok(())) => {
                    for reference in &task.references {
                        resolve_reference(items, &mut lists, reference, filename);
                    }
                }
                TaskState::Done(Err(e)) => {
                    report.failed += 1;
                    warn!("Failed to download {}: {}", task.url, e);
                    for reference in &task.references {
                        reject_reference(items, &mut lists, reference);
                    }
                }
                TaskState::Pending => {}
            }
        }

        for reference in &unresolvable {
            report.failed += 1;
            let error = FetchError::InvalidUrl(reference.url.clone());
            warn!("{}, dropping it", error);
            reject_reference(items, &mut lists, reference);
        }

        for ((identifier, field), entries) in lists {
            if let Some(item) = items.get_mut(&identifier) {
                let joined: Vec<String> = entries.into_iter().flatten().collect();
                item.set(field, Value::Text(joined.join(",")));
            }
        }

        report.downloaded = tasks
            .values()
            .filter(|t| matches!(t.state, TaskState::Done(Ok(()))))
            .count();

        counter!("feed_importer_assets_downloaded_total").increment(report.downloaded as u64);
        counter!("feed_importer_assets_failed_total").increment(report.failed as u64);
        info!(
            "Assets: {} references, {} downloaded, {} already present, {} shared, {} failed",
            report.references,
            report.downloaded,
            report.reused_local,
            report.deduplicated,
            report.failed
        );
        Ok(report)
    }

    async fn register(
        &self,
        reference: Reference,
        tasks: &mut IndexMap<String, DownloadTask>,
        unresolvable: &mut Vec<Reference>,
        report: &mut FetchReport,
    ) {
        report.references += 1;

        let Some(filename) = local_filename(&reference.url) else {
            unresolvable.push(reference);
            return;
        };

        if let Some(task) = tasks.get_mut(&filename) {
            report.deduplicated += 1;
            task.references.push(reference);
            return;
        }

        let target = self.media_dir.join(&filename);
        let state = if tokio::fs::try_exists(&target).await.unwrap_or(false) {
            debug!("{} already present, skipping download", filename);
            report.reused_local += 1;
            TaskState::Local
        } else {
            TaskState::Pending
        };

        tasks.insert(
            filename,
            DownloadTask {
                url: reference.url.clone(),
                references: vec![reference],
                state,
            },
        );
    }

    async fn download_pending(&self, tasks: &mut IndexMap<String, DownloadTask>, concurrency: usize) {
        let semaphore = Arc::new(Semaphore::new(concurrency));
        let mut join_set = JoinSet::new();

        for (filename, task) in tasks.iter() {
            if !matches!(task.state, TaskState::Pending) {
                continue;
            }

            let permit = match semaphore.clone().acquire_owned().await {
                Ok(permit) => permit,
                Err(_) => break,
            };
            let downloader = Arc::clone(&self.downloader);
            let target = self.media_dir.join(filename);
            let filename = filename.clone();
            let url = task.url.clone();

            join_set.spawn(async move {
                let _permit = permit;
                let result = downloader.download(&url, &target).await;
                if result.is_err() {
                    remove_partial(&target).await;
                }
                (filename, result)
            });
        }

        while let Some(joined) = join_set.join_next().await {
            match joined {
                Ok((filename, result)) => {
                    if let Some(task) = tasks.get_mut(&filename) {
                        task.state = TaskState::Done(result);
                    }
                }
                Err(e) => warn!("Download task did not complete: {}", e),
            }
        }

        for (filename, task) in tasks.iter_mut() {
            if matches!(task.state, TaskState::Pending) {
                remove_partial(&self.media_dir.join(filename)).await;
                task.state = TaskState::Done(Err(FetchError::Aborted(task.url.clone())));
            }
        }
    }
}

async fn remove_partial(target: &Path) {
    if tokio::fs::try_exists(target).await.unwrap_or(false) {
        if let Err(e) = tokio::fs::remove_file(target).await {
            warn!("Could not remove partial file {}: {}", target.display(), e);
        }
    }
}

/// Splits a list field into trimmed, unique, non-empty entries.
fn split_list(value: &Value) -> Vec<Option<String>> {
    let raw: Vec<String> = match value {
        Value::Null => Vec::new(),
        Value::Text(s) => s.split(',').map(str::to_string).collect(),
        Value::List(values) => values.clone(),
    };

    let mut seen = HashSet::new();
    raw.into_iter()
        .map(|entry| entry.trim().to_string())
        .filter(|entry| !entry.is_empty() && seen.insert(entry.clone()))
        .map(Some)
        .collect()
}

fn resolve_reference(items: &mut ItemCollection, lists: &mut ListTable, reference: &Reference, filename: &str) {
    match reference.index {
        Some(index) => {
            let key = (reference.identifier.clone(), reference.field.clone());
            if let Some(slot) = lists.get_mut(&key).and_then(|entries| entries.get_mut(index)) {
                *slot = Some(filename.to_string());
            }
        }
        None => {
            if let Some(item) = items.get_mut(&reference.identifier) {
                item.set(reference.field.clone(), filename);
            }
        }
    }
}

/// Nulls every field and list entry of the referencing item equal to the failed URL.
fn reject_reference(items: &mut ItemCollection, lists: &mut ListTable, reference: &Reference) {
    let url = reference.url.as_str();

    if let Some(item) = items.get_mut(&reference.identifier) {
        for (_, value) in item.fields_mut() {
            if matches!(&*value, Value::Text(s) if s == url) {
                *value = Value::Null;
            } else if let Value::List(entries) = value {
                entries.retain(|entry| entry != url);
            }
        }
    }

    for ((identifier, _), entries) in lists.iter_mut() {
        if *identifier != reference.identifier {
            continue;
        }
        for entry in entries.iter_mut() {
            if entry.as_deref() == Some(url) {
                *entry = None;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_local_filename() {
        assert_eq!(
            local_filename("https://cdn.example.com/img/red shirt.jpg?v=3"),
            Some("redshirt.jpg".to_string())
        );
        assert_eq!(
            local_filename("http://cdn.example.com/a/b/photo.png#top"),
            Some("photo.png".to_string())
        );
        assert_eq!(local_filename("https://cdn.example.com/"), None);
        assert_eq!(local_filename("https://cdn.example.com"), None);
        assert_eq!(local_filename("https://cdn.example.com/.."), None);
    }

    #[test]
    fn test_split_list_trims_and_dedups() {
        let value = Value::text("a.jpg, b.jpg,,a.jpg ");
        assert_eq!(
            split_list(&value),
            vec![Some("a.jpg".to_string()), Some("b.jpg".to_string())]
        );
        assert!(split_list(&Value::Null).is_empty());
    }
}
