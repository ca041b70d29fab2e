//! Model download functionality using hf-hub
//!
//! Snapshots are fetched through the hub's own blob cache (which gives us
//! resumable downloads) and then materialized in a per-model directory of
//! the [`ModelCache`]. Blobs are hard-linked into place when both caches
//! share a filesystem, so a checkpoint is stored once.

use anyhow::{Context, Result};
use async_trait::async_trait;
use dashmap::DashMap;
use globset::{Glob, GlobSet, GlobSetBuilder};
use hf_hub::api::tokio::{Api, ApiBuilder, ApiRepo};
use hf_hub::{Repo, RepoType};
use std::path::{Component, Path, PathBuf};
use std::sync::Arc;
use tokio::sync::Mutex;

use super::cache::{ModelCache, bytes_to_gb, dir_size};
use crate::config::DownloaderConfig;

/// Files skipped by cache-managed downloads (safetensors weights only)
pub const DEFAULT_IGNORE_PATTERNS: &[&str] = &[
    "*.bin",
    "pytorch_model*.bin",
    "optimizer.pt",
    "scheduler.pt",
    "training_args.bin",
    "*.msgpack",
    "*.h5",
];

/// Compiled set of shell-style ignore patterns
#[derive(Debug, Clone)]
pub struct IgnorePatterns {
    set: GlobSet,
}

impl IgnorePatterns {
    pub fn new<S: AsRef<str>>(patterns: &[S]) -> Result<Self> {
        let mut builder = GlobSetBuilder::new();
        for pattern in patterns {
            let glob = Glob::new(pattern.as_ref())
                .with_context(|| format!("Invalid ignore pattern: {}", pattern.as_ref()))?;
            builder.add(glob);
        }
        let set = builder.build().context("Failed to build ignore pattern set")?;
        Ok(Self { set })
    }

    pub fn empty() -> Self {
        Self {
            set: GlobSet::empty(),
        }
    }

    /// Match against the repo-relative path and against the bare file name
    pub fn is_ignored(&self, path: &str) -> bool {
        if self.set.is_match(path) {
            return true;
        }
        Path::new(path)
            .file_name()
            .is_some_and(|name| self.set.is_match(name))
    }
}

/// A full-repository snapshot to materialize in `local_dir`
#[derive(Debug, Clone)]
pub struct SnapshotRequest {
    pub repo_id: String,
    pub local_dir: PathBuf,
    pub ignore_patterns: Vec<String>,
    pub revision: Option<String>,
    /// Re-fetch files that are already present in `local_dir`
    pub force: bool,
}

impl SnapshotRequest {
    pub fn new(repo_id: impl Into<String>, local_dir: impl Into<PathBuf>) -> Self {
        Self {
            repo_id: repo_id.into(),
            local_dir: local_dir.into(),
            ignore_patterns: Vec::new(),
            revision: None,
            force: false,
        }
    }

    pub fn with_ignore_patterns(mut self, patterns: Vec<String>) -> Self {
        self.ignore_patterns = patterns;
        self
    }

    pub fn with_force(mut self, force: bool) -> Self {
        self.force = force;
        self
    }
}

/// Source of model repository snapshots
#[async_trait]
pub trait SnapshotSource: Send + Sync {
    /// Materialize every non-ignored repository file under `request.local_dir`
    async fn snapshot(&self, request: &SnapshotRequest) -> Result<PathBuf>;
}

/// Snapshot source backed by the HuggingFace Hub
#[derive(Debug, Clone, Default)]
pub struct HfHubSource {
    /// Hub blob cache; `None` uses the standard HF cache location
    hub_cache_dir: Option<PathBuf>,
    token: Option<String>,
    progress: bool,
}

impl HfHubSource {
    pub fn new() -> Self {
        Self::default()
    }

    /// Read the access token from `HF_TOKEN` and the blob cache from `HF_HOME`
    pub fn from_env() -> Self {
        Self {
            hub_cache_dir: Some(super::cache::hub_cache_dir()),
            token: std::env::var("HF_TOKEN").ok().filter(|t| !t.is_empty()),
            progress: false,
        }
    }

    pub fn with_cache_dir(mut self, dir: PathBuf) -> Self {
        self.hub_cache_dir = Some(dir);
        self
    }

    pub fn with_progress(mut self, progress: bool) -> Self {
        self.progress = progress;
        self
    }

    fn api(&self) -> Result<Api> {
        let mut builder = ApiBuilder::new()
            .with_progress(self.progress)
            .with_token(self.token.clone());
        if let Some(dir) = &self.hub_cache_dir {
            builder = builder.with_cache_dir(dir.clone());
        }
        builder.build().context("Failed to create HF API client")
    }

    fn repo(&self, api: &Api, request: &SnapshotRequest) -> ApiRepo {
        match &request.revision {
            Some(revision) => api.repo(Repo::with_revision(
                request.repo_id.clone(),
                RepoType::Model,
                revision.clone(),
            )),
            None => api.model(request.repo_id.clone()),
        }
    }
}

/// Repo file names must stay inside the target directory
fn is_safe_relative(path: &str) -> bool {
    Path::new(path)
        .components()
        .all(|c| matches!(c, Component::Normal(_)))
}

/// Remote side of a snapshot
#[async_trait]
pub trait RepoFiles: Send + Sync {
    /// Repository-relative names of every file in the revision
    async fn list(&self) -> Result<Vec<String>>;

    /// Fetch one file and return a local path holding its contents
    async fn fetch(&self, file: &str) -> Result<PathBuf>;
}

struct HubRepoFiles {
    repo: ApiRepo,
    repo_id: String,
}

#[async_trait]
impl RepoFiles for HubRepoFiles {
    async fn list(&self) -> Result<Vec<String>> {
        let info = self
            .repo
            .info()
            .await
            .with_context(|| format!("Failed to fetch repository info for {}", self.repo_id))?;
        tracing::info!(model_id = %self.repo_id, sha = %info.sha, "Resolved repository revision");
        Ok(info.siblings.into_iter().map(|s| s.rfilename).collect())
    }

    async fn fetch(&self, file: &str) -> Result<PathBuf> {
        self.repo
            .get(file)
            .await
            .with_context(|| format!("Failed to download {}", file))
    }
}

#[async_trait]
impl SnapshotSource for HfHubSource {
    async fn snapshot(&self, request: &SnapshotRequest) -> Result<PathBuf> {
        let api = self.api()?;
        let files = HubRepoFiles {
            repo: self.repo(&api, request),
            repo_id: request.repo_id.clone(),
        };
        materialize(&files, request).await
    }
}

/// Bring `request.local_dir` up to date with the files of a repository
///
/// Files already present are kept without a fetch unless `request.force` is
/// set. A file only ever appears under its final name once complete, so a
/// present file is a whole one.
pub async fn materialize(files: &dyn RepoFiles, request: &SnapshotRequest) -> Result<PathBuf> {
    let ignore = IgnorePatterns::new(request.ignore_patterns.as_slice())?;

    let wanted: Vec<String> = files
        .list()
        .await?
        .into_iter()
        .filter(|f| is_safe_relative(f) && !ignore.is_ignored(f))
        .collect();

    tracing::info!(
        model_id = %request.repo_id,
        file_count = wanted.len(),
        "Resolved snapshot file list"
    );

    tokio::fs::create_dir_all(&request.local_dir)
        .await
        .with_context(|| format!("Failed to create {:?}", request.local_dir))?;

    let mut fetched = 0usize;
    for file in &wanted {
        let dest = request.local_dir.join(file);
        if !request.force && is_present(&dest).await {
            tracing::debug!(file = %file, "Already present, skipping fetch");
            continue;
        }

        tracing::debug!(model_id = %request.repo_id, file = %file, "Downloading file");
        let blob = files.fetch(file).await?;

        if let Some(parent) = dest.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .with_context(|| format!("Failed to create {:?}", parent))?;
        }
        place_file(&blob, &dest)
            .await
            .with_context(|| format!("Failed to place {} into {:?}", file, dest))?;
        fetched += 1;
    }

    tracing::info!(
        model_id = %request.repo_id,
        fetched,
        skipped = wanted.len() - fetched,
        "Snapshot materialized"
    );
    Ok(request.local_dir.clone())
}

async fn is_present(dest: &Path) -> bool {
    tokio::fs::metadata(dest)
        .await
        .is_ok_and(|metadata| metadata.is_file())
}

fn staging_path(dest: &Path) -> PathBuf {
    let mut name = dest
        .file_name()
        .map(|n| n.to_os_string())
        .unwrap_or_default();
    name.push(".part");
    dest.with_file_name(name)
}

/// Put the blob behind `source` at `dest`
///
/// The hub hands out snapshot symlinks, so the link is resolved first and
/// the blob itself is hard-linked. Across filesystems the blob is copied.
/// Either way the file is staged next to `dest` and renamed into place.
async fn place_file(source: &Path, dest: &Path) -> Result<()> {
    let blob = tokio::fs::canonicalize(source)
        .await
        .with_context(|| format!("Failed to resolve {:?}", source))?;
    let staging = staging_path(dest);

    if let Err(e) = tokio::fs::remove_file(&staging).await
        && e.kind() != std::io::ErrorKind::NotFound
    {
        return Err(e).with_context(|| format!("Failed to clear {:?}", staging));
    }

    if let Err(e) = tokio::fs::hard_link(&blob, &staging).await {
        tracing::debug!(blob = ?blob, error = %e, "Hard link failed, copying blob");
        tokio::fs::copy(&blob, &staging)
            .await
            .with_context(|| format!("Failed to copy {:?}", blob))?;
    }

    tokio::fs::rename(&staging, dest)
        .await
        .with_context(|| format!("Failed to rename {:?}", staging))?;

    // rename is a no-op when both names already link the same inode
    if tokio::fs::try_exists(&staging).await.unwrap_or(false) {
        tokio::fs::remove_file(&staging).await?;
    }
    Ok(())
}

/// Cache-managed model downloader
pub struct ModelDownloader {
    cache: ModelCache,
    source: Arc<dyn SnapshotSource>,
    min_free_space_gb: f64,
    ignore_patterns: Vec<String>,
    /// One lock per cache directory name
    locks: DashMap<String, Arc<Mutex<()>>>,
}

impl ModelDownloader {
    pub fn new(cache: ModelCache, source: Arc<dyn SnapshotSource>) -> Self {
        let defaults = DownloaderConfig::default();
        Self {
            cache,
            source,
            min_free_space_gb: defaults.min_free_space_gb,
            ignore_patterns: defaults.ignore_patterns,
            locks: DashMap::new(),
        }
    }

    pub fn from_config(config: &DownloaderConfig, source: Arc<dyn SnapshotSource>) -> Result<Self> {
        // Fail fast on bad patterns rather than at first download
        IgnorePatterns::new(config.ignore_patterns.as_slice())?;
        Ok(Self {
            cache: ModelCache::new(&config.cache_dir)?,
            source,
            min_free_space_gb: config.min_free_space_gb,
            ignore_patterns: config.ignore_patterns.clone(),
            locks: DashMap::new(),
        })
    }

    pub fn with_min_free_space_gb(mut self, gb: f64) -> Self {
        self.min_free_space_gb = gb;
        self
    }

    pub fn cache(&self) -> &ModelCache {
        &self.cache
    }

    /// Download a model into the cache and return its local directory
    ///
    /// A directory that already holds `config.json` is returned as-is unless
    /// `force_download` is set. On failure the partial directory is removed
    /// and the original error is returned. Downloads of the same model are
    /// serialized; a waiter that finds the model complete returns it.
    pub async fn download_model(&self, model_id: &str, force_download: bool) -> Result<PathBuf> {
        let model_cache_dir = self.cache.model_dir(model_id)?;

        let lock = self.download_lock(&model_cache_dir);
        let _guard = lock.lock().await;

        if !force_download && self.cache.is_complete(model_id) {
            tracing::info!(model_id = %model_id, path = ?model_cache_dir, "Using cached model");
            crate::metrics::record_cache_hit(model_id);
            return Ok(model_cache_dir);
        }

        tracing::info!(model_id = %model_id, "Starting model download");
        tracing::info!(path = ?model_cache_dir, "Download target");

        self.has_free_space();

        let request = SnapshotRequest::new(model_id, model_cache_dir.clone())
            .with_ignore_patterns(self.ignore_patterns.clone())
            .with_force(force_download);

        match self.source.snapshot(&request).await {
            Ok(_) => {
                let dir = model_cache_dir.clone();
                let size = tokio::task::spawn_blocking(move || dir_size(&dir))
                    .await
                    .unwrap_or(0);
                tracing::info!(
                    model_id = %model_id,
                    size_gb = %format!("{:.1}", bytes_to_gb(size)),
                    "Download complete"
                );
                crate::metrics::record_download(model_id, "success");
                Ok(model_cache_dir)
            }
            Err(e) => {
                tracing::error!(model_id = %model_id, error = %e, "Download failed");
                crate::metrics::record_download(model_id, "failure");
                if model_cache_dir.exists()
                    && let Err(cleanup_err) = tokio::fs::remove_dir_all(&model_cache_dir).await
                {
                    tracing::warn!(
                        path = ?model_cache_dir,
                        error = %cleanup_err,
                        "Failed to remove partial download"
                    );
                }
                Err(e)
            }
        }
    }

    fn download_lock(&self, dir: &Path) -> Arc<Mutex<()>> {
        self.locks
            .entry(dir.to_string_lossy().into_owned())
            .or_default()
            .clone()
    }

    /// Log the free space on the cache filesystem, warning when it is below
    /// the configured minimum
    ///
    /// Returns false only when the space is known to be short. Downloads go
    /// ahead regardless.
    pub fn has_free_space(&self) -> bool {
        match self.cache.free_space_gb() {
            Ok(free) => {
                tracing::info!(free_gb = %format!("{:.1}", free), "Available disk space");
                if free < self.min_free_space_gb {
                    tracing::warn!(
                        free_gb = %format!("{:.1}", free),
                        required_gb = self.min_free_space_gb,
                        "Low disk space"
                    );
                    return false;
                }
                true
            }
            Err(e) => {
                tracing::warn!(error = %e, "Could not determine free disk space");
                true
            }
        }
    }

    /// Keep only the `keep_latest` most recently modified cached models
    pub fn cleanup_old_models(&self, keep_latest: usize) -> Result<Vec<PathBuf>> {
        self.cache.cleanup_old_models(keep_latest)
    }
}

// ============================================================================
// Mock Implementation for Testing
// ============================================================================


#[cfg(test)]
mod tests {
    use super::mocks::{MockRepoFiles, MockSnapshotSource};
    use super::*;
    use std::os::unix::fs::MetadataExt;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    fn default_ignore() -> IgnorePatterns {
        IgnorePatterns::new(DEFAULT_IGNORE_PATTERNS).unwrap()
    }

    #[test]
    fn test_default_ignore_patterns() {
        let ignore = default_ignore();
        assert!(ignore.is_ignored("pytorch_model.bin"));
        assert!(ignore.is_ignored("pytorch_model-00001-of-00002.bin"));
        assert!(ignore.is_ignored("training_args.bin"));
        assert!(ignore.is_ignored("optimizer.pt"));
        assert!(ignore.is_ignored("flax_model.msgpack"));
        assert!(ignore.is_ignored("tf_model.h5"));
        assert!(ignore.is_ignored("subfolder/weights.bin"));

        assert!(!ignore.is_ignored("config.json"));
        assert!(!ignore.is_ignored("model-00001-of-00007.safetensors"));
        assert!(!ignore.is_ignored("tokenizer.json"));
        assert!(!ignore.is_ignored("model.pt"));
    }

    #[test]
    fn test_empty_ignore_patterns() {
        let ignore = IgnorePatterns::empty();
        assert!(!ignore.is_ignored("pytorch_model.bin"));
    }

    #[test]
    fn test_invalid_ignore_pattern() {
        assert!(IgnorePatterns::new(&["[unclosed"]).is_err());
    }

    #[test]
    fn test_is_safe_relative() {
        assert!(is_safe_relative("config.json"));
        assert!(is_safe_relative("onnx/model.onnx"));
        assert!(!is_safe_relative("../escape.json"));
        assert!(!is_safe_relative("/etc/passwd"));
    }

    #[tokio::test]
    async fn test_api_builder_with_cache_dir() {
        let temp_dir = tempfile::tempdir().unwrap();
        let source = HfHubSource::new().with_cache_dir(temp_dir.path().to_path_buf());
        assert!(source.api().is_ok());
    }

    #[tokio::test]
    async fn test_download_then_cache_hit() {
        let temp_dir = tempfile::tempdir().unwrap();
        let source = Arc::new(MockSnapshotSource::new(&[
            ("config.json", "{}"),
            ("model.safetensors", "weights"),
            ("pytorch_model.bin", "legacy"),
        ]));
        let downloader =
            ModelDownloader::new(ModelCache::new(temp_dir.path()).unwrap(), source.clone());

        let path = downloader.download_model("org/model", false).await.unwrap();
        assert_eq!(path, temp_dir.path().join("org--model"));
        assert!(path.join("config.json").exists());
        assert!(path.join("model.safetensors").exists());
        assert!(!path.join("pytorch_model.bin").exists());
        assert_eq!(source.calls(), 1);

        let again = downloader.download_model("org/model", false).await.unwrap();
        assert_eq!(again, path);
        assert_eq!(source.calls(), 1);

        downloader.download_model("org/model", true).await.unwrap();
        assert_eq!(source.calls(), 2);
    }

    #[tokio::test]
    async fn test_incomplete_dir_is_redownloaded() {
        let temp_dir = tempfile::tempdir().unwrap();
        let stale = temp_dir.path().join("org--model");
        std::fs::create_dir_all(&stale).unwrap();
        std::fs::write(stale.join("model.safetensors"), "partial").unwrap();

        let source = Arc::new(MockSnapshotSource::new(&[("config.json", "{}")]));
        let downloader =
            ModelDownloader::new(ModelCache::new(temp_dir.path()).unwrap(), source.clone());

        downloader.download_model("org/model", false).await.unwrap();
        assert_eq!(source.calls(), 1);
    }

    #[tokio::test]
    async fn test_failure_removes_partial_dir() {
        let temp_dir = tempfile::tempdir().unwrap();
        let source = Arc::new(MockSnapshotSource::failing(&[
            ("tokenizer.json", "{}"),
            ("model-00001.safetensors", "a"),
            ("config.json", "{}"),
        ]));
        let downloader = ModelDownloader::new(ModelCache::new(temp_dir.path()).unwrap(), source);

        let err = downloader.download_model("org/model", false).await.unwrap_err();
        assert!(err.to_string().contains("connection reset"));
        assert!(!temp_dir.path().join("org--model").exists());
    }

    #[tokio::test]
    async fn test_rejects_invalid_model_id() {
        let temp_dir = tempfile::tempdir().unwrap();
        let source = Arc::new(MockSnapshotSource::new(&[]));
        let downloader =
            ModelDownloader::new(ModelCache::new(temp_dir.path()).unwrap(), source.clone());

        assert!(downloader.download_model("", false).await.is_err());
        assert!(downloader.download_model("../outside", false).await.is_err());
        assert!(downloader.download_model(".", false).await.is_err());
        assert!(downloader.download_model(".hidden", false).await.is_err());
        assert_eq!(source.calls(), 0);
    }

    #[tokio::test]
    async fn test_failed_dot_id_keeps_other_models() {
        let temp_dir = tempfile::tempdir().unwrap();
        let other = temp_dir.path().join("Qwen--Qwen3-VL-32B-Instruct-FP8");
        std::fs::create_dir_all(&other).unwrap();
        std::fs::write(other.join("config.json"), "{}").unwrap();

        let source = Arc::new(MockSnapshotSource::failing(&[("a", "1"), ("b", "2")]));
        let downloader =
            ModelDownloader::new(ModelCache::new(temp_dir.path()).unwrap(), source.clone());

        for id in [".", "./", "./."] {
            assert!(downloader.download_model(id, false).await.is_err());
        }
        assert_eq!(source.calls(), 0);
        assert!(other.join("config.json").is_file());
        assert!(
            downloader
                .cache()
                .is_complete("Qwen/Qwen3-VL-32B-Instruct-FP8")
        );
    }

    #[tokio::test]
    async fn test_low_disk_space_still_downloads() {
        let temp_dir = tempfile::tempdir().unwrap();
        let source = Arc::new(MockSnapshotSource::new(&[("config.json", "{}")]));
        let downloader =
            ModelDownloader::new(ModelCache::new(temp_dir.path()).unwrap(), source.clone())
                .with_min_free_space_gb(f64::MAX);

        assert!(!downloader.has_free_space());

        let path = downloader.download_model("org/model", false).await.unwrap();
        assert!(path.join("config.json").is_file());
        assert_eq!(source.calls(), 1);
    }

    #[tokio::test]
    async fn test_enough_disk_space() {
        let temp_dir = tempfile::tempdir().unwrap();
        let source = Arc::new(MockSnapshotSource::new(&[]));
        let downloader = ModelDownloader::new(ModelCache::new(temp_dir.path()).unwrap(), source)
            .with_min_free_space_gb(0.0);
        assert!(downloader.has_free_space());
    }

    #[tokio::test]
    async fn test_concurrent_downloads_fetch_once() {
        let temp_dir = tempfile::tempdir().unwrap();
        let source = Arc::new(
            MockSnapshotSource::new(&[("model.safetensors", "weights"), ("config.json", "{}")])
                .with_delay(Duration::from_millis(20)),
        );
        let downloader =
            ModelDownloader::new(ModelCache::new(temp_dir.path()).unwrap(), source.clone());

        let (a, b) = tokio::join!(
            downloader.download_model("org/model", false),
            downloader.download_model("org/model", false)
        );

        assert_eq!(a.unwrap(), b.unwrap());
        assert_eq!(source.calls(), 1);
        assert!(downloader.cache().is_complete("org/model"));
    }

    /// Fails its first snapshot partway through, succeeds afterwards
    struct FailOnceSource {
        calls: AtomicUsize,
    }

    #[async_trait]
    impl SnapshotSource for FailOnceSource {
        async fn snapshot(&self, request: &SnapshotRequest) -> Result<PathBuf> {
            let call = self.calls.fetch_add(1, Ordering::SeqCst);
            tokio::fs::create_dir_all(&request.local_dir).await?;
            tokio::fs::write(request.local_dir.join("model.safetensors"), "weights").await?;
            tokio::time::sleep(Duration::from_millis(20)).await;
            if call == 0 {
                anyhow::bail!("connection reset");
            }
            tokio::fs::write(request.local_dir.join("config.json"), "{}").await?;
            Ok(request.local_dir.clone())
        }
    }

    #[tokio::test]
    async fn test_failed_download_does_not_remove_concurrent_one() {
        let temp_dir = tempfile::tempdir().unwrap();
        let source = Arc::new(FailOnceSource {
            calls: AtomicUsize::new(0),
        });
        let downloader =
            ModelDownloader::new(ModelCache::new(temp_dir.path()).unwrap(), source.clone());

        let (a, b) = tokio::join!(
            downloader.download_model("org/model", false),
            downloader.download_model("org/model", false)
        );

        let results = [a, b];
        assert_eq!(results.iter().filter(|r| r.is_err()).count(), 1);
        let path = results.into_iter().find_map(|r| r.ok()).unwrap();
        assert!(path.join("config.json").is_file());
        assert!(path.join("model.safetensors").is_file());
        assert_eq!(source.calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_second_materialize_fetches_nothing() {
        let temp_dir = tempfile::tempdir().unwrap();
        let repo = MockRepoFiles::new(
            &temp_dir.path().join("hub"),
            &[
                ("config.json", "{}"),
                ("model.safetensors", "weights"),
                ("pytorch_model.bin", "legacy"),
                ("../escape.json", "{}"),
            ],
        );
        let request = SnapshotRequest::new("org/model", temp_dir.path().join("local"))
            .with_ignore_patterns(DEFAULT_IGNORE_PATTERNS.iter().map(|p| p.to_string()).collect());

        let dir = materialize(&repo, &request).await.unwrap();
        assert_eq!(repo.fetched(), vec!["config.json", "model.safetensors"]);
        assert_eq!(
            std::fs::read_to_string(dir.join("model.safetensors")).unwrap(),
            "weights"
        );
        assert!(!dir.join("pytorch_model.bin").exists());
        assert!(!temp_dir.path().join("escape.json").exists());

        materialize(&repo, &request).await.unwrap();
        assert_eq!(repo.fetched().len(), 2);

        materialize(&repo, &request.clone().with_force(true))
            .await
            .unwrap();
        assert_eq!(repo.fetched().len(), 4);
    }

    #[tokio::test]
    async fn test_materialize_fills_in_missing_files() {
        let temp_dir = tempfile::tempdir().unwrap();
        let local = temp_dir.path().join("local");
        std::fs::create_dir_all(&local).unwrap();
        std::fs::write(local.join("model.safetensors"), "weights").unwrap();

        let repo = MockRepoFiles::new(
            &temp_dir.path().join("hub"),
            &[("config.json", "{}"), ("model.safetensors", "weights")],
        );
        materialize(&repo, &SnapshotRequest::new("org/model", &local))
            .await
            .unwrap();

        assert_eq!(repo.fetched(), vec!["config.json"]);
        assert!(local.join("config.json").is_file());
    }

    #[tokio::test]
    async fn test_place_file_hard_links_blob() {
        let temp_dir = tempfile::tempdir().unwrap();
        let blob = temp_dir.path().join("blob");
        let link = temp_dir.path().join("snapshot-link");
        let dest = temp_dir.path().join("model.safetensors");
        std::fs::write(&blob, "weights").unwrap();
        std::os::unix::fs::symlink(&blob, &link).unwrap();

        place_file(&link, &dest).await.unwrap();

        let dest_meta = std::fs::symlink_metadata(&dest).unwrap();
        assert!(dest_meta.file_type().is_file());
        assert_eq!(dest_meta.ino(), std::fs::metadata(&blob).unwrap().ino());
        assert_eq!(dest_meta.nlink(), 2);
        assert!(!staging_path(&dest).exists());
    }

    #[tokio::test]
    async fn test_place_file_replaces_existing() {
        let temp_dir = tempfile::tempdir().unwrap();
        let blob = temp_dir.path().join("blob");
        let dest = temp_dir.path().join("config.json");
        std::fs::write(&blob, r#"{"new": true}"#).unwrap();
        std::fs::write(&dest, "{}").unwrap();
        std::fs::write(staging_path(&dest), "stale").unwrap();

        place_file(&blob, &dest).await.unwrap();
        assert_eq!(std::fs::read_to_string(&dest).unwrap(), r#"{"new": true}"#);

        // Placing the same blob again leaves no staging file behind
        place_file(&blob, &dest).await.unwrap();
        assert!(!staging_path(&dest).exists());
        assert_eq!(std::fs::metadata(&blob).unwrap().nlink(), 2);
    }

    #[tokio::test]
    #[ignore = "requires network access"]
    async fn test_snapshot_small_model() {
        let temp_dir = tempfile::tempdir().unwrap();
        let source = HfHubSource::from_env().with_cache_dir(temp_dir.path().join("hub"));
        let request = SnapshotRequest::new(
            "sentence-transformers/all-MiniLM-L6-v2",
            temp_dir.path().join("local"),
        )
        .with_ignore_patterns(DEFAULT_IGNORE_PATTERNS.iter().map(|p| p.to_string()).collect());

        let path = source.snapshot(&request).await.unwrap();
        assert!(path.join("config.json").exists());
        assert!(!path.join("pytorch_model.bin").exists());
    }
}
