//! Crawl orchestration.
//!
//! Drives the full pass: target generation, sequential list pages with
//! early exit on an exhausted page, in-run dedup, batched enrichment,
//! persistent dedup, archive commit and rate-limited dispatch. Failures
//! inside one job, page or batch never abort the run; only failing to
//! build the session pool is fatal.

use std::sync::Arc;
use tokio::sync::mpsc;

use crate::archive::{ArchiveStore, ObjectStore};
use crate::config::CollectorConfig;
use crate::dedup::{RunCache, TtlCache};
use crate::dispatch::{OutboundMessage, RateLimitedDispatcher};
use crate::enrich::{DetailBatcher, EnrichOutcome};
use crate::error::Result;
use crate::export;
use crate::list_page::{fetch_list_page, PageResult};
use crate::session::Session;
use crate::targets::{expand, split_terms};
use crate::types::{JobRecord, ProgressEvent, RunSummary, SearchRequest};

/// Optional channel for ordered progress events.
pub type EventSender = mpsc::Sender<ProgressEvent>;

/// The collection pipeline, with every collaborator injected.
pub struct Collector<S: Session, B: ObjectStore> {
    config: CollectorConfig,
    list_session: Arc<S>,
    batcher: DetailBatcher<S>,
    archive: ArchiveStore<B>,
    ttl_cache: TtlCache,
    dispatcher: Option<RateLimitedDispatcher>,
}

impl<S: Session, B: ObjectStore> Collector<S, B> {
    /// Assemble a collector. `sessions` must hold at least one session for
    /// list fetching plus the detail pool.
    pub fn new(
        config: CollectorConfig,
        list_session: S,
        detail_sessions: Vec<S>,
        archive: ArchiveStore<B>,
        ttl_cache: TtlCache,
        dispatcher: Option<RateLimitedDispatcher>,
    ) -> Self {
        let batcher = DetailBatcher::new(detail_sessions, config.clone());
        Self {
            config,
            list_session: Arc::new(list_session),
            batcher,
            archive,
            ttl_cache,
            dispatcher,
        }
    }

    pub fn archive(&self) -> &ArchiveStore<B> {
        &self.archive
    }

    /// Run one collection pass.
    pub async fn run(
        &mut self,
        request: &SearchRequest,
        events: Option<EventSender>,
    ) -> Result<RunSummary> {
        let keywords = split_terms(&request.search_text);
        let countries = split_terms(&request.location_text);

        emit(
            &events,
            ProgressEvent::log_stage(
                format!(
                    "Collecting {} keyword(s) across {} country(ies)",
                    keywords.len(),
                    countries.len()
                ),
                "discovery",
                0,
            ),
        )
        .await;

        let discovered = self.discover(request, &events).await;
        let discovered_count = discovered.len();

        emit(
            &events,
            ProgressEvent::log_stage(
                format!("Discovered {} unique job(s)", discovered_count),
                "enrichment",
                40,
            ),
        )
        .await;

        let outcomes = self.batcher.enrich_all(discovered).await;
        let succeeded = outcomes.iter().filter(|o| o.is_enriched()).count();
        let failed = outcomes.len() - succeeded;

        // Streaming consumers see each failure, not just the aggregate.
        for outcome in &outcomes {
            if let EnrichOutcome::Failed { record, message, .. } = outcome {
                emit(
                    &events,
                    ProgressEvent::log(format!(
                        "Enrichment failed for {}: {}",
                        record.url, message
                    )),
                )
                .await;
            }
        }

        emit(
            &events,
            ProgressEvent::log_stage(
                format!("Enriched {} job(s), {} failed", succeeded, failed),
                "archive",
                75,
            ),
        )
        .await;

        let records: Vec<JobRecord> =
            outcomes.into_iter().map(EnrichOutcome::into_record).collect();

        // Persistent dedup and archive commit.
        let mut archived = 0usize;
        let mut skipped = 0usize;
        let mut to_notify: Vec<JobRecord> = Vec::new();

        for record in records {
            let in_ttl = self.ttl_cache.contains(&record.url);
            if self.archive.add(record.clone()) {
                archived += 1;
            } else {
                skipped += 1;
            }
            if !in_ttl {
                to_notify.push(record);
            }
        }

        let committed = self.archive.save_pending().await;
        tracing::info!(archived, committed, skipped, "archive commit finished");

        let filename = self.notify(&to_notify, &events).await;

        let summary = RunSummary {
            discovered: discovered_count,
            succeeded,
            failed,
            archived: committed,
            skipped_duplicates: skipped,
            keywords: keywords.clone(),
            countries: countries.clone(),
        };

        emit(
            &events,
            ProgressEvent::Complete {
                job_count: summary.archived,
                countries,
                keywords,
                filename,
            },
        )
        .await;

        Ok(summary)
    }

    /// Walk every crawl target, paginating until an exhausted page or the
    /// page ceiling, deduplicating URLs within the run.
    async fn discover(
        &self,
        request: &SearchRequest,
        events: &Option<EventSender>,
    ) -> Vec<JobRecord> {
        let targets = expand(request, self.config.max_pages);
        let run_cache = RunCache::new();
        let mut discovered = Vec::new();

        // Targets arrive ordered by (keyword, country, page); pages for one
        // pair are contiguous, so a single skip flag handles early exit.
        let mut exhausted_pair: Option<(String, String)> = None;

        for target in &targets {
            let pair = (target.keyword.clone(), target.country.clone());
            if exhausted_pair.as_ref() == Some(&pair) {
                continue;
            }

            match fetch_list_page(
                self.list_session.as_ref(),
                target,
                request.time_filter_seconds,
            )
            .await
            {
                Ok(PageResult::Listings(records)) => {
                    let mut fresh = 0;
                    for record in records {
                        if run_cache.insert(&record.url) {
                            discovered.push(record);
                            fresh += 1;
                        }
                    }
                    tracing::debug!(
                        keyword = %target.keyword,
                        country = %target.country,
                        page = target.page_number,
                        fresh,
                        "list page parsed"
                    );
                }
                Ok(PageResult::Exhausted) => {
                    // Zero results is a legitimate terminal state for the
                    // pair, not a transient failure.
                    exhausted_pair = Some(pair);
                }
                Err(e) => {
                    tracing::warn!(
                        keyword = %target.keyword,
                        country = %target.country,
                        page = target.page_number,
                        error = %e,
                        "list page failed, advancing to next target"
                    );
                    emit(
                        events,
                        ProgressEvent::log(format!(
                            "Failed page {} for '{}' in {}: {}",
                            target.page_number, target.keyword, target.country, e
                        )),
                    )
                    .await;
                    exhausted_pair = Some(pair);
                }
            }
        }

        discovered
    }

    /// Dispatch new jobs; only confirmed deliveries enter the TTL cache.
    async fn notify(
        &mut self,
        jobs: &[JobRecord],
        events: &Option<EventSender>,
    ) -> Option<String> {
        let dispatcher = self.dispatcher.as_ref()?;
        if jobs.is_empty() {
            return None;
        }

        let mut messages: Vec<OutboundMessage> = jobs
            .iter()
            .map(|job| {
                OutboundMessage::Text(format!(
                    "{} at {} ({})\n{}",
                    job.title, job.company, job.location, job.url
                ))
            })
            .collect();

        // The reported filename exists only when the document was actually
        // queued for dispatch.
        let filename = match export::to_csv(jobs) {
            Ok(bytes) => {
                let filename = jobs
                    .first()
                    .map(|job| export::export_filename(&job.extracted_date))
                    .unwrap_or_else(|| "jobs.csv".to_string());
                messages.push(OutboundMessage::Document {
                    filename: filename.clone(),
                    bytes,
                    caption: format!("{} new job(s)", jobs.len()),
                });
                Some(filename)
            }
            Err(e) => {
                tracing::warn!(error = %e, "export failed, sending text only");
                None
            }
        };

        let report = dispatcher.dispatch_all(&messages).await;

        // Index-aligned: only per-job messages mark their URL as cached.
        for index in &report.delivered {
            if let Some(job) = jobs.get(*index) {
                self.ttl_cache.insert(&job.url);
            }
        }
        self.ttl_cache.save().await;

        if report.failed_count() > 0 {
            emit(
                events,
                ProgressEvent::log(format!(
                    "{} of {} notification(s) failed; they will retry next run",
                    report.failed_count(),
                    messages.len()
                )),
            )
            .await;
        }

        filename
    }
}

async fn emit(events: &Option<EventSender>, event: ProgressEvent) {
    if let Some(sender) = events {
        // A dropped receiver just means nobody is streaming this run.
        let _ = sender.send(event).await;
    }
}
