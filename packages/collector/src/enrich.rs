//! Detail-page enrichment.
//!
//! Visits each discovered job's detail page to recover compensation,
//! recruiter identity and the long-form description, using a fixed pool of
//! reusable sessions. Jobs are assigned round-robin within a batch; a batch
//! is awaited to full settlement before the next one starts, which bounds
//! open connections regardless of total job count. Output order always
//! matches input order by index, even though completion order does not.

use futures::future::join_all;
use scraper::{Html, Selector};
use std::sync::Arc;

use crate::config::CollectorConfig;
use crate::error::{FetchError, FetchResult};
use crate::list_page::{first_attr, first_text};
use crate::session::{NavigatedPage, Session};
use crate::types::JobRecord;

/// Path fragment every legitimate job-detail URL contains. Navigation that
/// lands outside this family was redirected (login wall, expired posting).
const DETAIL_PATH_FAMILY: &str = "/jobs/view/";

/// Ordered candidates for the detail page's main content container.
const CONTENT_SELECTORS: &[&str] = &[
    "div.decorated-job-posting__details",
    "div.details",
    "section.core-section-container",
    "div.job-view-layout",
];

/// Markers of an authentication or interstitial wall.
const AUTH_WALL_SELECTORS: &[&str] = &[
    "div.authwall",
    "form.join-form",
    "main.app__content form[action*='login']",
];

const COMPENSATION_SELECTORS: &[&str] = &[
    "div.salary.compensation__salary",
    "div.compensation__salary",
    "span.salary-range",
];

const DESCRIPTION_SELECTORS: &[&str] = &[
    "div.description__text",
    "div.show-more-less-html__markup",
    "section.description",
];

const REFERRAL_SELECTORS: &[&str] = &[
    "div.find-a-referral__cta-container",
    "a.find-a-referral__cta",
];

/// Second, more specific chain used to recover a higher-fidelity detailed
/// description from the raw description HTML.
const DETAIL_DESCRIPTION_SELECTORS: &[&str] = &[
    "div.show-more-less-html__markup--clamp-after-5",
    "div.show-more-less-html__markup",
    "section.show-more-less-html",
];

/// Classified failure for one enrichment job.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureKind {
    Timeout,
    Network,
    Blocked,
    Redirected,
    NoContent,
    /// The record itself was malformed (no link, unparseable URL); no
    /// amount of retrying or backoff helps.
    Structural,
}

impl FailureKind {
    fn from_error(error: &FetchError) -> Self {
        match error {
            FetchError::Timeout { .. } => FailureKind::Timeout,
            FetchError::Blocked { .. } => FailureKind::Blocked,
            FetchError::Redirected { .. } => FailureKind::Redirected,
            FetchError::NoContent { .. } => FailureKind::NoContent,
            FetchError::MissingLink | FetchError::InvalidUrl { .. } => FailureKind::Structural,
            _ => FailureKind::Network,
        }
    }
}

impl std::fmt::Display for FailureKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            FailureKind::Timeout => "timeout",
            FailureKind::Network => "network",
            FailureKind::Blocked => "blocked",
            FailureKind::Redirected => "redirected",
            FailureKind::NoContent => "no content",
            FailureKind::Structural => "structural",
        };
        f.write_str(name)
    }
}

/// Tagged per-job result. The legacy `Error: <message>` placeholder shape
/// is materialized only when crossing the storage/export boundary via
/// [`EnrichOutcome::into_record`].
#[derive(Debug)]
pub enum EnrichOutcome {
    Enriched(JobRecord),
    Failed {
        record: JobRecord,
        kind: FailureKind,
        message: String,
    },
}

impl EnrichOutcome {
    pub fn is_enriched(&self) -> bool {
        matches!(self, EnrichOutcome::Enriched(_))
    }

    pub fn record(&self) -> &JobRecord {
        match self {
            EnrichOutcome::Enriched(record) => record,
            EnrichOutcome::Failed { record, .. } => record,
        }
    }

    /// Collapse into a record, applying the failure placeholder convention.
    pub fn into_record(self) -> JobRecord {
        match self {
            EnrichOutcome::Enriched(record) => record,
            EnrichOutcome::Failed { record, message, .. } => record.with_failure(&message),
        }
    }
}

/// Fixed-pool detail enrichment batcher.
pub struct DetailBatcher<S: Session> {
    sessions: Vec<Arc<S>>,
    config: CollectorConfig,
}

impl<S: Session> DetailBatcher<S> {
    /// Build from an already-constructed session pool. The pool size is the
    /// batch size.
    pub fn new(sessions: Vec<S>, config: CollectorConfig) -> Self {
        Self {
            sessions: sessions.into_iter().map(Arc::new).collect(),
            config,
        }
    }

    pub fn pool_size(&self) -> usize {
        self.sessions.len()
    }

    /// Enrich every job, preserving input order in the output.
    ///
    /// Batches run to full settlement. The inter-batch delay doubles when a
    /// batch's failures outnumber its successes; the doubling is keyed on
    /// that batch alone, so a healthy batch drops back to the base delay.
    pub async fn enrich_all(&self, jobs: Vec<JobRecord>) -> Vec<EnrichOutcome> {
        let total = jobs.len();
        let batch_size = self.sessions.len().max(1);
        let mut outcomes = Vec::with_capacity(total);
        let batch_count = total.div_ceil(batch_size);

        for (batch_index, batch) in jobs
            .chunks(batch_size)
            .map(<[JobRecord]>::to_vec)
            .enumerate()
        {
            tracing::info!(
                batch = batch_index + 1,
                batches = batch_count,
                size = batch.len(),
                "enriching batch"
            );

            let futures = batch.into_iter().enumerate().map(|(i, job)| {
                let session = Arc::clone(&self.sessions[i % batch_size]);
                async move { self.enrich_one(session.as_ref(), job).await }
            });

            // join_all settles every job and preserves index order.
            let batch_outcomes = join_all(futures).await;

            let failures = batch_outcomes.iter().filter(|o| !o.is_enriched()).count();
            let successes = batch_outcomes.len() - failures;
            outcomes.extend(batch_outcomes);

            let is_last = batch_index + 1 == batch_count;
            if !is_last {
                let delay = if failures > successes {
                    tracing::warn!(
                        failures,
                        successes,
                        "batch error ratio high, doubling inter-batch delay"
                    );
                    self.config.batch_delay * 2
                } else {
                    self.config.batch_delay
                };
                tokio::time::sleep(delay).await;
            }
        }

        outcomes
    }

    /// Enrich one job with retry on the transient whitelist.
    async fn enrich_one(&self, session: &S, job: JobRecord) -> EnrichOutcome {
        let url = job.url.clone();
        let mut retry = 0;

        loop {
            match self.attempt(session, &job).await {
                Ok(record) => return EnrichOutcome::Enriched(record),
                Err(error) => {
                    if error.is_retryable() && retry < self.config.max_retries {
                        retry += 1;
                        let delay = self.config.retry_delay(retry);
                        tracing::warn!(
                            url = %url,
                            retry,
                            delay_ms = delay.as_millis() as u64,
                            error = %error,
                            "retrying detail fetch"
                        );
                        tokio::time::sleep(delay).await;
                        continue;
                    }

                    let kind = FailureKind::from_error(&error);
                    let message = error.to_string();
                    tracing::warn!(url = %url, kind = %kind, "detail fetch failed");
                    return EnrichOutcome::Failed {
                        record: job,
                        kind,
                        message,
                    };
                }
            }
        }
    }

    /// Single navigation + extraction attempt.
    async fn attempt(&self, session: &S, job: &JobRecord) -> FetchResult<JobRecord> {
        if job.url.trim().is_empty() {
            return Err(FetchError::MissingLink);
        }

        let page = session.navigate(&job.url).await?;

        if page.left_path_family(DETAIL_PATH_FAMILY) {
            return Err(FetchError::Redirected {
                from: page.requested_url,
                to: page.final_url,
            });
        }

        extract_detail(&page, job.clone(), self.config.min_detail_len)
    }
}

/// Parse a detail page into an enriched record.
///
/// Synchronous on purpose: `scraper::Html` is not `Send`, so the document
/// must never be held across an await point.
pub fn extract_detail(
    page: &NavigatedPage,
    mut job: JobRecord,
    min_detail_len: usize,
) -> FetchResult<JobRecord> {
    let document = Html::parse_document(&page.html);

    let root = document.root_element();
    let container_found = CONTENT_SELECTORS.iter().any(|s| {
        Selector::parse(s)
            .map(|sel| document.select(&sel).next().is_some())
            .unwrap_or(false)
    });

    if !container_found {
        if AUTH_WALL_SELECTORS.iter().any(|s| {
            Selector::parse(s)
                .map(|sel| document.select(&sel).next().is_some())
                .unwrap_or(false)
        }) || page.html.contains("authwall")
        {
            return Err(FetchError::Blocked {
                url: page.final_url.clone(),
            });
        }
        return Err(FetchError::NoContent {
            url: page.final_url.clone(),
        });
    }

    job.compensation = first_text(root, COMPENSATION_SELECTORS);
    let description = first_text(root, DESCRIPTION_SELECTORS);
    if !description.is_empty() {
        job.description = description;
    }
    job.referral = first_text(root, REFERRAL_SELECTORS);

    // Recruiter contact card, when the posting carries one.
    if let Ok(card_selector) = Selector::parse("div.message-the-recruiter") {
        if let Some(card) = document.select(&card_selector).next() {
            job.recruiter_name = first_text(card, &["h3.base-main-card__title", "h3"]);
            job.recruiter_role = first_text(card, &["h4.base-main-card__subtitle", "h4"]);
            job.recruiter_photo = first_attr(card, &["img"], "src").unwrap_or_default();
            job.recruiter_profile_url = first_attr(card, &["a"], "href").unwrap_or_default();
        }
    }

    job.detailed_description = extract_detailed_description(&document, min_detail_len);

    Ok(job)
}

/// Re-parse for a higher-fidelity detailed description.
///
/// The specific chain wins when it produces anything; otherwise fall back
/// to any element whose class name contains "description", trusted only
/// when longer than `min_detail_len` characters.
fn extract_detailed_description(document: &Html, min_detail_len: usize) -> String {
    for selector_str in DETAIL_DESCRIPTION_SELECTORS {
        let Ok(selector) = Selector::parse(selector_str) else {
            continue;
        };
        if let Some(element) = document.select(&selector).next() {
            let text = element.text().collect::<String>().trim().to_string();
            if !text.is_empty() {
                return text;
            }
        }
    }

    if let Ok(any) = Selector::parse("[class*='description']") {
        for element in document.select(&any) {
            let text = element.text().collect::<String>().trim().to_string();
            if text.len() > min_detail_len {
                return text;
            }
        }
    }

    String::new()
}
