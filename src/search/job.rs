// ABOUTME: Search job orchestration: validate, encode, scan, batch, rank, publish
// ABOUTME: Jobs run in the background and report through the shared ProgressStore

use super::{
    progress::{JobUpdate, ProgressStore, DEFAULT_RETENTION},
    rank::{rank_indices, sort_results, to_result},
    BatchProcessor, ContentDescriber, TokenRelevanceAnalyzer, DEFAULT_WORKERS,
};
use crate::{
    embeddings::{EmbeddingCache, EmbeddingModel, QueryEncoder},
    model::{Embedding, JobSnapshot, JobStatus, LastSearch, Query, ScoredResult, SearchRequest},
    storage::{self, Paths},
    util::is_supported_image,
    Error, Result,
};
use chrono::Utc;
use parking_lot::Mutex;
use std::ops::RangeInclusive;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, info_span, warn, Instrument};
use uuid::Uuid;
use walkdir::WalkDir;

const SCANNING_PROGRESS: u8 = 10;

#[derive(Debug, Clone)]
pub struct SearchConfig {
    /// Concurrent encodes per batch.
    pub workers: usize,
    pub retention: Duration,
    pub poll_interval: Duration,
    /// Progress range covered by ProcessingBatches.
    pub progress_band: RangeInclusive<u8>,
    pub describe_results: bool,
    /// Where the last-search record goes. `None` disables persistence.
    pub settings_path: Option<PathBuf>,
}

impl Default for SearchConfig {
    fn default() -> Self {
        SearchConfig {
            workers: DEFAULT_WORKERS,
            retention: DEFAULT_RETENTION,
            poll_interval: Duration::from_millis(500),
            progress_band: 30..=90,
            describe_results: true,
            settings_path: None,
        }
    }
}

impl SearchConfig {
    pub fn for_paths(paths: &Paths) -> Self {
        SearchConfig {
            settings_path: Some(paths.settings_path.clone()),
            ..Default::default()
        }
    }
}

/// Everything the background task needs, fixed at submission.
struct Job {
    query: Query,
    vector: Embedding,
    analyzer: Option<TokenRelevanceAnalyzer>,
    folder: PathBuf,
    min_score: f32,
    batch_size: usize,
}

#[derive(Clone)]
pub struct SearchOrchestrator {
    encoder: QueryEncoder,
    processor: BatchProcessor,
    store: Arc<ProgressStore>,
    config: Arc<SearchConfig>,
    describer: Arc<Mutex<Option<Arc<ContentDescriber>>>>,
}

impl SearchOrchestrator {
    pub fn new(model: Arc<dyn EmbeddingModel>, config: SearchConfig) -> Self {
        Self::with_cache(Arc::new(EmbeddingCache::new(model)), config)
    }

    pub fn with_cache(cache: Arc<EmbeddingCache>, config: SearchConfig) -> Self {
        SearchOrchestrator {
            encoder: QueryEncoder::new(cache.clone()),
            processor: BatchProcessor::new(cache, config.workers),
            store: ProgressStore::new(config.retention),
            config: Arc::new(config),
            describer: Arc::new(Mutex::new(None)),
        }
    }

    pub fn store(&self) -> &Arc<ProgressStore> {
        &self.store
    }

    pub fn cache(&self) -> &Arc<EmbeddingCache> {
        self.encoder.cache()
    }

    pub fn config(&self) -> &SearchConfig {
        &self.config
    }

    /// Accepts a search and returns its job id without waiting for the scan.
    ///
    /// Validation, a missing folder, and an unusable query are reported here
    /// and no job is created for them.
    pub async fn submit(&self, request: SearchRequest) -> Result<String> {
        let query = request.validate()?;
        if !request.folder.is_dir() {
            return Err(Error::FolderNotFound(request.folder.clone()));
        }

        self.persist(LastSearch {
            kind: query.kind(),
            query: query.label(),
            folder: request.folder.clone(),
            results: Vec::new(),
            timestamp: Utc::now(),
        })
        .await;

        let vector = self.encoder.encode_blocking(query.clone()).await?;
        let analyzer = match &query {
            Query::Text(text) => {
                let encoder = self.encoder.clone();
                let text = text.clone();
                let analyzer =
                    tokio::task::spawn_blocking(move || TokenRelevanceAnalyzer::new(&encoder, &text))
                        .await
                        .map_err(|e| Error::Query(format!("token encoder task failed: {}", e)))??;
                Some(analyzer)
            }
            Query::Image(_) => None,
        };

        let job_id = Uuid::new_v4().to_string();
        self.store.create(&job_id);
        self.store.update(
            &job_id,
            JobUpdate::status(JobStatus::ScanningFolder).progress(SCANNING_PROGRESS),
        );

        let job = Job {
            query,
            vector,
            analyzer,
            folder: request.folder,
            min_score: request.min_score,
            batch_size: request.batch_size,
        };
        let span = info_span!("search_job", job_id = %job_id);
        tokio::spawn(self.clone().execute(job_id.clone(), job).instrument(span));

        Ok(job_id)
    }

    pub fn progress(&self, job_id: &str) -> Result<JobSnapshot> {
        self.store.read(job_id)
    }

    /// Polls `job_id` every `poll_interval`, handing each snapshot to
    /// `on_snapshot`, and returns the terminal one.
    pub async fn follow<F>(&self, job_id: &str, mut on_snapshot: F) -> Result<JobSnapshot>
    where
        F: FnMut(&JobSnapshot),
    {
        let period = self.config.poll_interval.max(Duration::from_millis(1));
        let mut ticker = tokio::time::interval(period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        loop {
            ticker.tick().await;
            let snapshot = self.store.read(job_id)?;
            on_snapshot(&snapshot);
            if snapshot.status.is_terminal() {
                return Ok(snapshot);
            }
        }
    }

    pub async fn wait(&self, job_id: &str) -> Result<JobSnapshot> {
        self.follow(job_id, |_| {}).await
    }

    pub fn last_search(&self) -> Result<Option<LastSearch>> {
        match &self.config.settings_path {
            Some(path) => storage::load_last_search(path),
            None => Ok(None),
        }
    }

    async fn execute(self, job_id: String, job: Job) {
        match self.run(&job_id, &job).await {
            Ok(results) => {
                info!(results = results.len(), "search complete");
                self.persist(LastSearch {
                    kind: job.query.kind(),
                    query: job.query.label(),
                    folder: job.folder.clone(),
                    results: results.clone(),
                    timestamp: Utc::now(),
                })
                .await;
                self.store.complete(&job_id, results);
            }
            Err(e) => {
                warn!(error = %e, "search failed");
                self.store.fail(&job_id, &e);
            }
        }
    }

    async fn run(&self, job_id: &str, job: &Job) -> Result<Vec<ScoredResult>> {
        let folder = job.folder.clone();
        let files = tokio::task::spawn_blocking(move || scan_folder(&folder))
            .await
            .map_err(|e| Error::Filesystem(std::io::Error::other(e)))??;

        let total = files.len();
        let (start, end) = (*self.config.progress_band.start(), *self.config.progress_band.end());
        info!(total, "folder scanned");
        self.store.update(
            job_id,
            JobUpdate::status(JobStatus::ProcessingBatches)
                .progress(start)
                .counts(0, total),
        );

        let describer = match job.query {
            Query::Image(_) if self.config.describe_results => self.describer().await,
            _ => None,
        };

        let batches = total.div_ceil(job.batch_size);
        let mut results = Vec::new();
        let mut processed = 0;
        for (i, batch) in files.chunks(job.batch_size).enumerate() {
            let candidates = self.processor.process(batch.to_vec()).await?;
            processed += batch.len();
            debug!(batch = i, embedded = candidates.len(), "batch embedded");

            // discovery order; the final stable sort then keeps composite ties in that order
            let mut survivors = rank_indices(&job.vector, &candidates, job.min_score);
            survivors.sort_by_key(|(idx, _)| *idx);
            for (idx, score) in survivors {
                let candidate = &candidates[idx];
                let mut result = to_result(candidate, score);
                if let Some(analyzer) = &job.analyzer {
                    result = analyzer.explain(result, &candidate.embedding);
                    if result.score < job.min_score {
                        continue;
                    }
                } else if let Some(describer) = &describer {
                    result.description = describer.describe(&candidate.embedding);
                }
                results.push(result);
            }

            let span = end.saturating_sub(start) as usize;
            let progress = start as usize + span * (i + 1) / batches;
            self.store.update(
                job_id,
                JobUpdate::default()
                    .progress(progress as u8)
                    .counts(processed, total)
                    .message(format!("Processed {}/{} images", processed, total)),
            );
        }

        sort_results(&mut results);
        Ok(results)
    }

    /// Category embeddings are built on first use and shared by later jobs.
    async fn describer(&self) -> Option<Arc<ContentDescriber>> {
        let cached = self.describer.lock().clone();
        if cached.is_some() {
            return cached;
        }

        let encoder = self.encoder.clone();
        match tokio::task::spawn_blocking(move || ContentDescriber::new(&encoder)).await {
            Ok(Ok(describer)) => {
                let describer = Arc::new(describer);
                *self.describer.lock() = Some(describer.clone());
                Some(describer)
            }
            Ok(Err(e)) => {
                warn!(error = %e, "content descriptions disabled for this search");
                None
            }
            Err(e) => {
                warn!(error = %e, "content describer task failed");
                None
            }
        }
    }

    async fn persist(&self, record: LastSearch) {
        let Some(path) = self.config.settings_path.clone() else {
            return;
        };
        let target = path.clone();
        match tokio::task::spawn_blocking(move || storage::save_last_search(&target, &record)).await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => warn!(error = %e, path = %path.display(), "could not save last search"),
            Err(e) => warn!(error = %e, "last search writer task failed"),
        }
    }
}

/// Recursively lists supported images under `folder` in file-name order.
/// Symlinks are not followed; unreadable entries are skipped.
pub fn scan_folder(folder: &Path) -> Result<Vec<PathBuf>> {
    if !folder.is_dir() {
        return Err(Error::FolderNotFound(folder.to_path_buf()));
    }

    let mut files = Vec::new();
    for entry in WalkDir::new(folder).follow_links(false).sort_by_file_name() {
        match entry {
            Ok(entry) if entry.file_type().is_file() && is_supported_image(entry.path()) => {
                files.push(entry.into_path());
            }
            Ok(_) => {}
            Err(e) => debug!(error = %e, "skipping unreadable entry"),
        }
    }
    Ok(files)
}
