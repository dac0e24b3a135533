//! The feedback learning engine
//!
//! `FeedbackLearner` is the explicit service object owning the store, the
//! semantic index and every derived tracker. It is constructed once at
//! process start from persisted state, injected into callers, and torn down
//! with a final flush.
//!
//! Write path: a validated submission is appended durably to the log (the
//! acknowledgement point), then folded into each derived structure. Reads
//! (`suggest`, `enhance_prompt`, `report`) take read locks only and run
//! freely in parallel.

pub mod enhance;
pub mod patterns;
pub mod report;
pub mod suggest;
pub mod tracker;
pub mod trends;

use crate::config::LearnerConfig;
use crate::embeddings::{self, EmbeddingService};
use crate::error::Result;
use crate::index::SemanticIndex;
use crate::keywords::KeywordExtractor;
use crate::store::{self, AggregateSnapshot, FeedbackStore, VectorStore, SNAPSHOT_VERSION};
use crate::types::{
    AccuracyReport, FeedbackRecord, FeedbackSubmission, RecordId, SimilarQuery, SuggestionBundle,
};
use chrono::Utc;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{Mutex, RwLock};
use tokio::task;
use tracing::{debug, info, warn};

use self::patterns::PatternRecognizer;
use self::report::FailureProfile;
use self::suggest::Exemplar;
use self::tracker::KeywordAccuracyTracker;
use self::trends::TrendAnalyzer;

/// The feedback and learning engine
pub struct FeedbackLearner {
    config: LearnerConfig,
    extractor: KeywordExtractor,
    embedder: Option<Arc<dyn EmbeddingService>>,

    store: FeedbackStore,
    vectors: Arc<VectorStore>,

    index: RwLock<SemanticIndex>,
    exemplars: RwLock<HashMap<RecordId, Exemplar>>,

    tracker: RwLock<KeywordAccuracyTracker>,
    patterns: RwLock<PatternRecognizer>,
    trends: RwLock<TrendAnalyzer>,
    failures: RwLock<FailureProfile>,

    /// Serializes aggregate application and snapshotting, so a snapshot
    /// always corresponds to exactly `records_applied` log records
    apply_lock: Mutex<()>,
    records_applied: AtomicU64,
}

impl FeedbackLearner {
    /// Open the engine from persisted state
    ///
    /// Builds the configured embedding backend; if that fails the engine
    /// still comes up, degraded to keyword-only behavior.
    pub async fn open(config: LearnerConfig) -> Result<Self> {
        config.validate()?;

        let embedder = match embeddings::build_service(&config.embedding).await {
            Ok(embedder) => embedder,
            Err(e) => {
                warn!("Embedding backend unavailable, running keyword-only: {}", e);
                None
            }
        };

        Self::with_embedder(config, embedder).await
    }

    /// Open the engine with an explicit (or no) embedding backend
    pub async fn with_embedder(
        config: LearnerConfig,
        embedder: Option<Arc<dyn EmbeddingService>>,
    ) -> Result<Self> {
        config.validate()?;

        let store = FeedbackStore::open(&config)?;
        let records = store.load_all().await?;

        let (vectors, vector_entries) = VectorStore::open(
            config.vectors_path(),
            &config.embedding.model,
            config.embedding.dimensions,
        )?;

        let mut index = SemanticIndex::new(config.embedding.dimensions);
        for (record_id, vector) in vector_entries {
            index.insert(record_id, vector)?;
        }

        // Aggregates come from the snapshot when it is usable, with the log
        // tail folded in on top; otherwise from a full replay. Either way
        // the result is identical; the snapshot is only a cache.
        let snapshot = store::snapshot::load(&config.snapshot_path()).filter(|snap| {
            let consistent = snap.records_applied <= records.len() as u64
                && snap.trends.bucket_hours() == config.trends.bucket_hours;
            if !consistent {
                warn!("Snapshot inconsistent with log or configuration; replaying from scratch");
            }
            consistent
        });

        let (mut tracker, mut patterns, mut trends, mut failures, replay_from) = match snapshot {
            Some(snap) => (
                snap.tracker,
                snap.patterns,
                snap.trends,
                snap.failures,
                snap.records_applied as usize,
            ),
            None => (
                KeywordAccuracyTracker::default(),
                PatternRecognizer::default(),
                TrendAnalyzer::new(config.trends.bucket_hours),
                FailureProfile::default(),
                0,
            ),
        };

        for record in &records[replay_from..] {
            apply_record(
                record,
                &mut tracker,
                &mut patterns,
                &mut trends,
                &mut failures,
                config.keywords.max_failure_examples,
            );
        }

        let exemplars: HashMap<RecordId, Exemplar> = records
            .iter()
            .map(|record| {
                (
                    record.id,
                    Exemplar {
                        query: record.original_query.clone(),
                        sql: record.generated_sql.clone(),
                        was_helpful: record.was_helpful,
                        keywords: record.keywords.clone(),
                        timestamp: record.timestamp,
                    },
                )
            })
            .collect();

        info!(
            "Feedback learner ready: {} records, {} indexed vectors, embedder {}",
            records.len(),
            index.len(),
            if embedder.is_some() { "on" } else { "off" }
        );

        let extractor = KeywordExtractor::new(config.keywords.min_token_len);

        Ok(Self {
            config,
            extractor,
            embedder,
            store,
            vectors: Arc::new(vectors),
            index: RwLock::new(index),
            exemplars: RwLock::new(exemplars),
            tracker: RwLock::new(tracker),
            patterns: RwLock::new(patterns),
            trends: RwLock::new(trends),
            failures: RwLock::new(failures),
            apply_lock: Mutex::new(()),
            records_applied: AtomicU64::new(records.len() as u64),
        })
    }

    /// Record one feedback submission
    ///
    /// Validation failures reject the whole submission with nothing stored.
    /// Success is acknowledged only after the record is durable in the log;
    /// the embedding and aggregate updates follow. Embedding failure
    /// degrades silently; the record still counts everywhere else.
    pub async fn record_feedback(&self, submission: FeedbackSubmission) -> Result<RecordId> {
        submission.validate()?;

        let keywords = self.extractor.extract(&submission.original_query);
        let record = FeedbackRecord::from_submission(submission, keywords);
        let record = self.store.append(record).await?;

        debug!(
            "Recorded {} feedback {} for {:?}",
            if record.was_helpful { "positive" } else { "negative" },
            record.id,
            record.original_query
        );

        if let Some(vector) = self.embed_with_timeout(&record.original_query).await {
            let vectors = Arc::clone(&self.vectors);
            let id = record.id;
            let to_store = vector.clone();
            let stored = task::spawn_blocking(move || vectors.append(id, &to_store)).await;

            match stored {
                Ok(Ok(())) => {
                    self.index.write().await.insert(record.id, vector)?;
                }
                Ok(Err(e)) => warn!("Vector sidecar write failed for {}: {}", record.id, e),
                Err(e) => warn!("Vector sidecar task failed for {}: {}", record.id, e),
            }
        }

        self.exemplars.write().await.insert(
            record.id,
            Exemplar {
                query: record.original_query.clone(),
                sql: record.generated_sql.clone(),
                was_helpful: record.was_helpful,
                keywords: record.keywords.clone(),
                timestamp: record.timestamp,
            },
        );

        let applied = {
            let _guard = self.apply_lock.lock().await;

            apply_record(
                &record,
                &mut *self.tracker.write().await,
                &mut *self.patterns.write().await,
                &mut *self.trends.write().await,
                &mut *self.failures.write().await,
                self.config.keywords.max_failure_examples,
            );

            self.records_applied.fetch_add(1, Ordering::SeqCst) + 1
        };

        let interval = self.config.persistence.snapshot_interval;
        if interval > 0 && applied % interval == 0 {
            if let Err(e) = self.flush().await {
                warn!("Periodic snapshot failed: {}", e);
            }
        }

        Ok(record.id)
    }

    /// Everything the engine has learned that bears on a query
    ///
    /// Read-only and safely cancellable. When no embedding can be obtained
    /// within the timeout, similar queries fall back to keyword overlap and
    /// the rest of the result is unaffected.
    pub async fn suggest(&self, query: &str) -> Result<SuggestionBundle> {
        let keywords = self.extractor.extract(query);
        let now = Utc::now();

        let similar = match self.embed_with_timeout(query).await {
            Some(vector) => {
                let hits = self
                    .index
                    .read()
                    .await
                    .search(&vector, self.config.retrieval.max_similar)?;

                let exemplars = self.exemplars.read().await;
                hits.into_iter()
                    .filter(|(_, similarity)| *similarity >= self.config.retrieval.min_similarity)
                    .filter_map(|(record_id, similarity)| {
                        exemplars.get(&record_id).map(|exemplar| SimilarQuery {
                            record_id,
                            query: exemplar.query.clone(),
                            sql: exemplar.sql.clone(),
                            was_helpful: exemplar.was_helpful,
                            similarity,
                        })
                    })
                    .collect()
            }
            None => {
                let exemplars = self.exemplars.read().await;
                suggest::similar_by_overlap(
                    &exemplars,
                    &keywords,
                    self.config.retrieval.max_similar,
                )
            }
        };

        let keyword_guidance = {
            let tracker = self.tracker.read().await;
            suggest::keyword_guidance(&tracker, &keywords, &self.config.keywords)
        };

        let suggestions = {
            let patterns = self.patterns.read().await;
            patterns.top_suggestions(
                &keywords,
                self.config.patterns.max_suggestions,
                now,
                &self.config.patterns,
            )
        };

        Ok(SuggestionBundle {
            similar,
            keyword_guidance,
            suggestions,
        })
    }

    /// Append learned context to a generation prompt
    ///
    /// With nothing learned yet the base prompt comes back unchanged.
    pub async fn enhance_prompt(&self, base_prompt: &str, query: &str) -> Result<String> {
        let bundle = self.suggest(query).await?;
        Ok(enhance::enhance(base_prompt, &bundle, &self.config.prompt))
    }

    /// Assemble the accuracy report; pure read
    pub async fn report(&self) -> AccuracyReport {
        let tracker = self.tracker.read().await;
        let patterns = self.patterns.read().await;
        let trends = self.trends.read().await;
        let failures = self.failures.read().await;

        report::build_report(
            &tracker,
            &patterns,
            &trends,
            &failures,
            &self.config,
            Utc::now(),
        )
    }

    /// Persist the aggregate snapshot
    pub async fn flush(&self) -> Result<()> {
        let _guard = self.apply_lock.lock().await;
        self.save_snapshot_locked().await
    }

    /// Discard the snapshot and rebuild every aggregate from the log
    pub async fn rebuild(&self) -> Result<()> {
        let _guard = self.apply_lock.lock().await;

        let records = self.store.load_all().await?;

        let mut tracker = KeywordAccuracyTracker::default();
        let mut patterns = PatternRecognizer::default();
        let mut trends = TrendAnalyzer::new(self.config.trends.bucket_hours);
        let mut failures = FailureProfile::default();

        for record in &records {
            apply_record(
                record,
                &mut tracker,
                &mut patterns,
                &mut trends,
                &mut failures,
                self.config.keywords.max_failure_examples,
            );
        }

        *self.tracker.write().await = tracker;
        *self.patterns.write().await = patterns;
        *self.trends.write().await = trends;
        *self.failures.write().await = failures;
        self.records_applied
            .store(records.len() as u64, Ordering::SeqCst);

        info!("Rebuilt aggregates from {} log records", records.len());
        self.save_snapshot_locked().await
    }

    /// Number of records the aggregates currently cover
    pub fn record_count(&self) -> u64 {
        self.records_applied.load(Ordering::SeqCst)
    }

    /// Whether an embedding backend is configured and was constructed
    pub fn embedder_available(&self) -> bool {
        self.embedder.is_some()
    }

    /// Engine configuration
    pub fn config(&self) -> &LearnerConfig {
        &self.config
    }

    /// Write the snapshot; caller must hold the apply lock
    async fn save_snapshot_locked(&self) -> Result<()> {
        let snapshot = AggregateSnapshot {
            version: SNAPSHOT_VERSION,
            records_applied: self.records_applied.load(Ordering::SeqCst),
            tracker: self.tracker.read().await.clone(),
            patterns: self.patterns.read().await.clone(),
            trends: self.trends.read().await.clone(),
            failures: *self.failures.read().await,
        };

        let path = self.config.snapshot_path();
        task::spawn_blocking(move || store::snapshot::save(&path, &snapshot))
            .await
            .map_err(|e| crate::error::SqlSageError::Other(format!("Task join error: {}", e)))?
    }

    /// Embed with the configured timeout; any failure degrades to None
    async fn embed_with_timeout(&self, text: &str) -> Option<Vec<f32>> {
        let embedder = self.embedder.as_ref()?;
        let budget = Duration::from_millis(self.config.embedding.timeout_ms);

        match tokio::time::timeout(budget, embedder.embed(text)).await {
            Ok(Ok(vector)) => {
                if vector.len() == self.config.embedding.dimensions {
                    Some(vector)
                } else {
                    warn!(
                        "Embedder returned {} dimensions, expected {}; ignoring",
                        vector.len(),
                        self.config.embedding.dimensions
                    );
                    None
                }
            }
            Ok(Err(e)) => {
                warn!("Embedding failed, degrading to keyword-only: {}", e);
                None
            }
            Err(_) => {
                warn!(
                    "Embedding timed out after {:?}, degrading to keyword-only",
                    budget
                );
                None
            }
        }
    }
}

/// Fold one record into every aggregate
///
/// The single application path shared by live updates, startup replay and
/// rebuild, which is what makes replay equivalence hold.
fn apply_record(
    record: &FeedbackRecord,
    tracker: &mut KeywordAccuracyTracker,
    patterns: &mut PatternRecognizer,
    trends: &mut TrendAnalyzer,
    failures: &mut FailureProfile,
    max_failure_examples: usize,
) {
    tracker.update(
        &record.keywords,
        record.was_helpful,
        &record.original_query,
        record.timestamp,
        max_failure_examples,
    );
    patterns.ingest(record);
    trends.record(record.timestamp, record.was_helpful);
    failures.ingest(record);
}
