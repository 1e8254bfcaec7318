// src/discovery.rs
//! One discovery cycle: query every source for every keyword, drop what was
//! already notified, persist the seen-set once.

use crate::core::SearchConfig;
use crate::notifier::ErrorReporter;
use crate::seen_store::{SeenSet, SeenStore};
use crate::sources::{SourceAdapter, SourceQuery};
use crate::types::{is_valid_source_name, JobRecord};
use anyhow::Result;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

/// Outcome of a successful cycle.
#[derive(Debug, Clone, Default)]
pub struct CycleReport {
    /// Jobs never notified before, in source-major, keyword-minor order
    pub novel: Vec<JobRecord>,
    pub fetched: usize,
    pub without_id: usize,
    pub duplicates: usize,
    pub adapter_calls: usize,
    pub failed_calls: usize,
    pub duration: Duration,
}

#[derive(Debug, Default)]
struct Classification {
    novel: Vec<JobRecord>,
    fetched: usize,
    without_id: usize,
    duplicates: usize,
}

type FetchTask = JoinHandle<Result<Result<Vec<JobRecord>>, tokio::time::error::Elapsed>>;

pub struct DiscoveryEngine {
    store: SeenStore,
    sources: Vec<Arc<dyn SourceAdapter>>,
    adapter_timeout: Duration,
    reporter: Option<Arc<ErrorReporter>>,
    // Held for a whole cycle so two cycles never load and persist interleaved;
    // the seen-set file lock extends this to other processes
    cycle_lock: Mutex<()>,
}

impl DiscoveryEngine {
    pub fn new(
        store: SeenStore,
        sources: Vec<Arc<dyn SourceAdapter>>,
        adapter_timeout: Duration,
    ) -> Self {
        Self {
            store,
            sources,
            adapter_timeout,
            reporter: None,
            cycle_lock: Mutex::new(()),
        }
    }

    pub fn with_error_reporter(mut self, reporter: Arc<ErrorReporter>) -> Self {
        self.reporter = Some(reporter);
        self
    }

    pub fn sources(&self) -> &[Arc<dyn SourceAdapter>] {
        &self.sources
    }

    /// Run one cycle against the registered sources
    pub async fn run_cycle(&self, config: &SearchConfig, recency_days: u32) -> Result<CycleReport> {
        self.run_cycle_with(config, recency_days, &self.sources).await
    }

    /// Run one cycle against an explicit list of sources.
    ///
    /// Waits for any cycle already in progress. Adapter failures only cost
    /// their own results; the only error returned is a seen-set that could
    /// not be persisted, in which case no job is reported as novel.
    pub async fn run_cycle_with(
        &self,
        config: &SearchConfig,
        recency_days: u32,
        sources: &[Arc<dyn SourceAdapter>],
    ) -> Result<CycleReport> {
        let _cycle = self.cycle_lock.lock().await;
        // Other processes sharing the seen-set file wait here too
        let _seen_lock = match self.store.lock().await {
            Ok(lock) => lock,
            Err(e) => {
                error!("Could not lock the seen-set, skipping cycle: {:#}", e);
                return Err(e);
            }
        };
        let started = Instant::now();

        info!(
            "Discovery cycle started: keywords={:?} sources={} location={} radius={}km recency={}d",
            config.keywords,
            sources.len(),
            config.location,
            config.radius,
            recency_days
        );

        let mut seen = self.store.load().await;

        let tasks = self.spawn_fetches(config, recency_days, sources);
        let adapter_calls = tasks.len();
        let mut batches = Vec::with_capacity(adapter_calls);
        let mut failed_calls = 0;

        for (source, keyword, task) in tasks {
            match self.collect(&source, &keyword, task).await {
                Some(jobs) => batches.push(jobs),
                None => failed_calls += 1,
            }
        }

        let classification = classify(batches, &mut seen);
        self.persist_with_retry(&seen, classification.novel.len()).await?;

        let report = CycleReport {
            novel: classification.novel,
            fetched: classification.fetched,
            without_id: classification.without_id,
            duplicates: classification.duplicates,
            adapter_calls,
            failed_calls,
            duration: started.elapsed(),
        };

        if report.novel.is_empty() {
            info!(
                "No new jobs found ({} fetched, {} of {} calls failed)",
                report.fetched, report.failed_calls, report.adapter_calls
            );
        } else {
            info!(
                "Discovery cycle found {} new jobs ({} fetched, {} duplicates, {} without id) in {:?}",
                report.novel.len(),
                report.fetched,
                report.duplicates,
                report.without_id,
                report.duration
            );
        }

        Ok(report)
    }

    /// One task per (source, keyword) pair, in source-major, keyword-minor order
    fn spawn_fetches(
        &self,
        config: &SearchConfig,
        recency_days: u32,
        sources: &[Arc<dyn SourceAdapter>],
    ) -> Vec<(String, String, FetchTask)> {
        let mut tasks = Vec::with_capacity(sources.len() * config.keywords.len());

        for source in sources {
            if !is_valid_source_name(source.name()) {
                error!(
                    "Skipping source '{}': names must not contain ':'",
                    source.name()
                );
                continue;
            }
            for keyword in &config.keywords {
                let adapter = Arc::clone(source);
                let timeout = self.adapter_timeout;
                let query = SourceQuery {
                    keyword: keyword.clone(),
                    location: config.location.clone(),
                    radius_km: config.radius,
                    recency_days,
                    work_type: config.work_type,
                };

                let task = tokio::spawn(async move {
                    tokio::time::timeout(timeout, adapter.fetch(&query)).await
                });
                tasks.push((source.name().to_string(), keyword.clone(), task));
            }
        }

        tasks
    }

    async fn collect(&self, source: &str, keyword: &str, task: FetchTask) -> Option<Vec<JobRecord>> {
        let failure = match task.await {
            Ok(Ok(Ok(jobs))) => {
                debug!("{} returned {} jobs for '{}'", source, jobs.len(), keyword);
                return Some(jobs);
            }
            Ok(Ok(Err(e))) => format!("{:#}", e),
            Ok(Err(_)) => format!("timed out after {:?}", self.adapter_timeout),
            Err(e) => format!("task aborted: {}", e),
        };

        warn!("Source {} failed for '{}': {}", source, keyword, failure);
        if let Some(reporter) = &self.reporter {
            reporter
                .report(&format!("{} error for '{}': {}", source, keyword, failure))
                .await;
        }
        None
    }

    async fn persist_with_retry(&self, seen: &SeenSet, novel: usize) -> Result<()> {
        let first = match self.store.persist(seen).await {
            Ok(()) => return Ok(()),
            Err(e) => e,
        };
        warn!("Persisting seen-set failed, retrying once: {:#}", first);

        if let Err(e) = self.store.persist(seen).await {
            error!(
                "Seen-set could not be persisted, withholding {} new jobs: {:#}",
                novel, e
            );
            if let Some(reporter) = &self.reporter {
                reporter
                    .report(&format!("Seen-set could not be persisted: {:#}", e))
                    .await;
            }
            return Err(e.context("Seen-set could not be persisted"));
        }

        Ok(())
    }
}

/// Keep the first occurrence of every identity that is not in `seen`, in
/// input order, and record it in `seen` so later duplicates are dropped too.
fn classify(batches: Vec<Vec<JobRecord>>, seen: &mut SeenSet) -> Classification {
    let mut result = Classification::default();

    for job in batches.into_iter().flatten() {
        result.fetched += 1;

        let Some(key) = job.seen_key() else {
            debug!("Dropping job without id from {}: {}", job.source, job.title);
            result.without_id += 1;
            continue;
        };

        if seen.add(key) {
            result.novel.push(job);
        } else {
            result.duplicates += 1;
        }
    }

    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::SeenKey;
    use anyhow::anyhow;
    use async_trait::async_trait;
    use std::collections::HashMap;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tempfile::TempDir;

    type DynSource = Arc<dyn SourceAdapter>;

    #[derive(Clone)]
    enum Behavior {
        Jobs(Vec<JobRecord>),
        JobsAfter(Duration, Vec<JobRecord>),
        Fail,
        Hang,
        Panic,
    }

    struct FakeSource {
        name: String,
        by_keyword: HashMap<String, Behavior>,
        calls: AtomicUsize,
    }

    impl FakeSource {
        fn new(name: &str) -> Self {
            Self {
                name: name.to_string(),
                by_keyword: HashMap::new(),
                calls: AtomicUsize::new(0),
            }
        }

        fn on(mut self, keyword: &str, behavior: Behavior) -> Self {
            self.by_keyword.insert(keyword.to_string(), behavior);
            self
        }

        fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl SourceAdapter for FakeSource {
        fn name(&self) -> &str {
            &self.name
        }

        async fn fetch(&self, query: &SourceQuery) -> Result<Vec<JobRecord>> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            match self.by_keyword.get(&query.keyword).cloned() {
                Some(Behavior::Jobs(jobs)) => Ok(jobs),
                Some(Behavior::JobsAfter(delay, jobs)) => {
                    tokio::time::sleep(delay).await;
                    Ok(jobs)
                }
                Some(Behavior::Fail) => Err(anyhow!("malformed response")),
                Some(Behavior::Hang) => {
                    tokio::time::sleep(Duration::from_secs(30)).await;
                    Ok(Vec::new())
                }
                Some(Behavior::Panic) => panic!("adapter bug"),
                None => Ok(Vec::new()),
            }
        }
    }

    fn job(source: &str, id: &str, title: &str) -> JobRecord {
        JobRecord::new(source, Some(id.to_string()), title, &format!("https://jobs/{}", id))
    }

    fn config(keywords: &[&str]) -> SearchConfig {
        SearchConfig {
            keywords: keywords.iter().map(|k| k.to_string()).collect(),
            ..SearchConfig::default()
        }
    }

    fn ids(jobs: &[JobRecord]) -> Vec<String> {
        jobs.iter()
            .map(|j| format!("{}:{}", j.source, j.id.as_deref().unwrap_or("-")))
            .collect()
    }

    struct Fixture {
        _dir: TempDir,
        store: SeenStore,
    }

    impl Fixture {
        fn new() -> Self {
            let dir = TempDir::new().unwrap();
            let store = SeenStore::new(dir.path().join("jobs_seen.json"));
            Self { _dir: dir, store }
        }

        fn engine(&self, sources: Vec<Arc<dyn SourceAdapter>>) -> DiscoveryEngine {
            DiscoveryEngine::new(self.store.clone(), sources, Duration::from_millis(200))
        }
    }

    #[tokio::test]
    async fn test_first_cycle_reports_job_and_records_it() {
        let fixture = Fixture::new();
        let source = Arc::new(FakeSource::new("a").on("admin", Behavior::Jobs(vec![job("a", "1", "Admin")])));
        let engine = fixture.engine(vec![source as DynSource]);

        assert!(!fixture.store.path().exists());
        let report = engine.run_cycle(&config(&["admin"]), 1).await.unwrap();

        assert_eq!(ids(&report.novel), vec!["a:1"]);
        assert!(fixture.store.path().exists());
        let seen = fixture.store.load().await;
        assert_eq!(seen.len(), 1);
        assert!(seen.contains(&SeenKey::new("a", "1")));
    }

    #[tokio::test]
    async fn test_second_identical_cycle_is_empty() {
        let fixture = Fixture::new();
        let source = Arc::new(FakeSource::new("a").on("admin", Behavior::Jobs(vec![job("a", "1", "Admin")])));
        let engine = fixture.engine(vec![source as DynSource]);

        let first = engine.run_cycle(&config(&["admin"]), 1).await.unwrap();
        let second = engine.run_cycle(&config(&["admin"]), 1).await.unwrap();

        assert_eq!(first.novel.len(), 1);
        assert!(second.novel.is_empty());
        assert_eq!(second.duplicates, 1);
        assert_eq!(fixture.store.load().await.len(), 1);
    }

    #[tokio::test]
    async fn test_same_job_from_two_keywords_reported_once() {
        let fixture = Fixture::new();
        let shared = job("a", "5", "Admin/Support");
        let source = Arc::new(
            FakeSource::new("a")
                .on("admin", Behavior::Jobs(vec![shared.clone()]))
                .on("support", Behavior::Jobs(vec![shared])),
        );
        let engine = fixture.engine(vec![source as DynSource]);

        let report = engine.run_cycle(&config(&["admin", "support"]), 1).await.unwrap();

        assert_eq!(ids(&report.novel), vec!["a:5"]);
        assert_eq!(report.duplicates, 1);
    }

    #[tokio::test]
    async fn test_timeout_in_one_source_does_not_stop_the_other() {
        let fixture = Fixture::new();
        let slow = Arc::new(FakeSource::new("a").on("admin", Behavior::Hang));
        let fast = Arc::new(FakeSource::new("b").on("admin", Behavior::Jobs(vec![job("b", "9", "Ops")])));
        let engine = fixture.engine(vec![slow as DynSource, fast as DynSource]);

        let report = engine.run_cycle(&config(&["admin"]), 1).await.unwrap();

        assert_eq!(ids(&report.novel), vec!["b:9"]);
        assert_eq!(report.failed_calls, 1);
        assert_eq!(report.adapter_calls, 2);
    }

    #[tokio::test]
    async fn test_partial_failure_keeps_other_results() {
        let fixture = Fixture::new();
        let a = Arc::new(
            FakeSource::new("a")
                .on("k1", Behavior::Jobs(vec![job("a", "1", "One")]))
                .on("k2", Behavior::Jobs(vec![job("a", "2", "Two")])),
        );
        let b = Arc::new(
            FakeSource::new("b")
                .on("k1", Behavior::Jobs(vec![job("b", "3", "Three")]))
                .on("k2", Behavior::Fail),
        );
        let engine = fixture.engine(vec![a as DynSource, b as DynSource]);

        let report = engine.run_cycle(&config(&["k1", "k2"]), 1).await.unwrap();

        assert_eq!(ids(&report.novel), vec!["a:1", "a:2", "b:3"]);
        assert_eq!(report.failed_calls, 1);
    }

    #[tokio::test]
    async fn test_order_is_source_major_keyword_minor() {
        let fixture = Fixture::new();
        // The first call finishes last; the result order must not follow completion order
        let a = Arc::new(
            FakeSource::new("a")
                .on(
                    "k1",
                    Behavior::JobsAfter(
                        Duration::from_millis(80),
                        vec![job("a", "1", "A1"), job("a", "2", "A2")],
                    ),
                )
                .on("k2", Behavior::Jobs(vec![job("a", "3", "A3")])),
        );
        let b = Arc::new(
            FakeSource::new("b")
                .on("k1", Behavior::Jobs(vec![job("b", "1", "B1")]))
                .on("k2", Behavior::Jobs(vec![job("b", "2", "B2")])),
        );
        let engine = fixture.engine(vec![a as DynSource, b as DynSource]);

        let report = engine.run_cycle(&config(&["k1", "k2"]), 1).await.unwrap();

        assert_eq!(ids(&report.novel), vec!["a:1", "a:2", "a:3", "b:1", "b:2"]);
    }

    #[tokio::test]
    async fn test_same_id_in_different_sources_are_distinct() {
        let fixture = Fixture::new();
        let a = Arc::new(FakeSource::new("a").on("k", Behavior::Jobs(vec![job("a", "42", "A")])));
        let b = Arc::new(FakeSource::new("b").on("k", Behavior::Jobs(vec![job("b", "42", "B")])));
        let engine = fixture.engine(vec![a as DynSource, b as DynSource]);

        let report = engine.run_cycle(&config(&["k"]), 1).await.unwrap();

        assert_eq!(ids(&report.novel), vec!["a:42", "b:42"]);
    }

    #[tokio::test]
    async fn test_source_with_colon_in_name_is_skipped() {
        let fixture = Fixture::new();
        let bad = Arc::new(FakeSource::new("job:board").on("k", Behavior::Jobs(vec![job("job:board", "1", "X")])));
        let good = Arc::new(FakeSource::new("a").on("k", Behavior::Jobs(vec![job("a", "1", "A")])));
        let engine = fixture.engine(vec![bad.clone() as DynSource, good as DynSource]);

        let report = engine.run_cycle(&config(&["k"]), 1).await.unwrap();

        assert_eq!(ids(&report.novel), vec!["a:1"]);
        assert_eq!(report.adapter_calls, 1);
        assert_eq!(bad.calls(), 0);
    }

    #[tokio::test]
    async fn test_jobs_without_id_are_dropped() {
        let fixture = Fixture::new();
        let no_id = JobRecord::new("a", None, "Mystery", "https://jobs/none");
        let source = Arc::new(FakeSource::new("a").on(
            "k",
            Behavior::Jobs(vec![no_id, job("a", "1", "Known")]),
        ));
        let engine = fixture.engine(vec![source as DynSource]);

        let report = engine.run_cycle(&config(&["k"]), 1).await.unwrap();

        assert_eq!(ids(&report.novel), vec!["a:1"]);
        assert_eq!(report.without_id, 1);
        assert_eq!(fixture.store.load().await.len(), 1);
    }

    #[tokio::test]
    async fn test_no_keywords_means_no_calls() {
        let fixture = Fixture::new();
        let source = Arc::new(FakeSource::new("a"));
        let engine = fixture.engine(vec![source.clone() as DynSource]);

        let report = engine.run_cycle(&config(&[]), 1).await.unwrap();

        assert!(report.novel.is_empty());
        assert_eq!(report.adapter_calls, 0);
        assert_eq!(source.calls(), 0);
        assert!(fixture.store.load().await.is_empty());
    }

    #[tokio::test]
    async fn test_all_sources_failing_is_not_an_error() {
        let fixture = Fixture::new();
        let mut seen = SeenSet::new();
        seen.add(SeenKey::new("a", "old"));
        fixture.store.persist(&seen).await.unwrap();

        let a = Arc::new(FakeSource::new("a").on("k", Behavior::Fail));
        let b = Arc::new(FakeSource::new("b").on("k", Behavior::Panic));
        let engine = fixture.engine(vec![a as DynSource, b as DynSource]);

        let report = engine.run_cycle(&config(&["k"]), 1).await.unwrap();

        assert!(report.novel.is_empty());
        assert_eq!(report.failed_calls, 2);
        assert_eq!(fixture.store.load().await, seen);
    }

    #[tokio::test]
    async fn test_persist_failure_withholds_novel_jobs() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("jobs_seen.json");
        std::fs::create_dir_all(path.join("blocked")).unwrap();

        let source = Arc::new(FakeSource::new("a").on("k", Behavior::Jobs(vec![job("a", "1", "One")])));
        let engine = DiscoveryEngine::new(
            SeenStore::new(path),
            vec![source as DynSource],
            Duration::from_millis(200),
        );

        assert!(engine.run_cycle(&config(&["k"]), 1).await.is_err());
    }

    #[tokio::test]
    async fn test_persist_retry_recovers_from_one_failure() {
        let fixture = Fixture::new();
        let source = Arc::new(FakeSource::new("a").on("k", Behavior::Jobs(vec![job("a", "1", "One")])));
        let engine = fixture.engine(vec![source as DynSource]);
        fixture.store.fail_next_persists(1);

        let report = engine.run_cycle(&config(&["k"]), 1).await.unwrap();

        assert_eq!(ids(&report.novel), vec!["a:1"]);
        assert!(fixture.store.load().await.contains(&SeenKey::new("a", "1")));
    }

    #[tokio::test]
    async fn test_two_failed_persists_report_nothing() {
        let fixture = Fixture::new();
        let source = Arc::new(FakeSource::new("a").on("k", Behavior::Jobs(vec![job("a", "1", "One")])));
        let engine = fixture.engine(vec![source as DynSource]);
        fixture.store.fail_next_persists(2);

        assert!(engine.run_cycle(&config(&["k"]), 1).await.is_err());
        assert!(fixture.store.load().await.is_empty());

        // Withheld jobs come back on the next cycle
        let report = engine.run_cycle(&config(&["k"]), 1).await.unwrap();
        assert_eq!(ids(&report.novel), vec!["a:1"]);
    }

    #[tokio::test]
    async fn test_engines_sharing_a_seen_file_report_each_job_once() {
        let fixture = Fixture::new();
        let engine = |store: SeenStore| {
            let source = Arc::new(FakeSource::new("a").on(
                "k",
                Behavior::JobsAfter(Duration::from_millis(50), vec![job("a", "1", "One")]),
            ));
            DiscoveryEngine::new(store, vec![source as DynSource], Duration::from_secs(2))
        };
        // Separate stores on one path, as two processes would have
        let first = engine(SeenStore::new(fixture.store.path().to_path_buf()));
        let second = engine(SeenStore::new(fixture.store.path().to_path_buf()));

        let first = tokio::spawn(async move { first.run_cycle(&config(&["k"]), 1).await });
        let second = tokio::spawn(async move { second.run_cycle(&config(&["k"]), 1).await });

        let first = first.await.unwrap().unwrap();
        let second = second.await.unwrap().unwrap();
        assert_eq!(first.novel.len() + second.novel.len(), 1);
        assert_eq!(fixture.store.load().await.len(), 1);
    }

    #[tokio::test]
    async fn test_concurrent_cycles_report_each_job_once() {
        let fixture = Fixture::new();
        let source = Arc::new(FakeSource::new("a").on(
            "k",
            Behavior::JobsAfter(Duration::from_millis(30), vec![job("a", "1", "One")]),
        ));
        let engine = Arc::new(fixture.engine(vec![source as DynSource]));

        let first = {
            let engine = Arc::clone(&engine);
            tokio::spawn(async move { engine.run_cycle(&config(&["k"]), 1).await })
        };
        let second = {
            let engine = Arc::clone(&engine);
            tokio::spawn(async move { engine.run_cycle(&config(&["k"]), 1).await })
        };

        let first = first.await.unwrap().unwrap();
        let second = second.await.unwrap().unwrap();
        assert_eq!(first.novel.len() + second.novel.len(), 1);
    }

    #[tokio::test]
    async fn test_query_carries_search_settings() {
        struct Recorder {
            queries: std::sync::Mutex<Vec<SourceQuery>>,
        }

        #[async_trait]
        impl SourceAdapter for Recorder {
            fn name(&self) -> &str {
                "rec"
            }

            async fn fetch(&self, query: &SourceQuery) -> Result<Vec<JobRecord>> {
                self.queries.lock().unwrap().push(query.clone());
                Ok(Vec::new())
            }
        }

        let fixture = Fixture::new();
        let recorder = Arc::new(Recorder {
            queries: std::sync::Mutex::new(Vec::new()),
        });
        let engine = fixture.engine(vec![recorder.clone() as DynSource]);

        engine.run_cycle(&config(&["admin"]), 14).await.unwrap();

        let queries = recorder.queries.lock().unwrap();
        assert_eq!(queries.len(), 1);
        assert_eq!(queries[0].keyword, "admin");
        assert_eq!(queries[0].location, "Coburg");
        assert_eq!(queries[0].radius_km, 100);
        assert_eq!(queries[0].recency_days, 14);
    }
}
