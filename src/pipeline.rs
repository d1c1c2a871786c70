use std::sync::Arc;

use chrono::Utc;
use serde::Serialize;
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::categorize::categorize;
use crate::db::{JobRecord, JobStore, StoreError};
use crate::fetch::{FetchError, PageFetcher};
use crate::parser::{extract_text, parse_listings, JobListing};
use crate::summarize::{SummarizeError, Summarizer};

/// Where the listings live.
#[derive(Debug, Clone)]
pub struct Site {
    /// Index page listing all current offers.
    pub listings_url: String,
    /// Prefix for the relative links found on listing cards.
    pub base_url: String,
}

/// Counts for one completed run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RunReport {
    pub listings: usize,
    pub inserted: usize,
    pub duplicates: usize,
    pub failed: usize,
}

/// Conditions that end a run before any listing is processed.
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("index page unavailable: {0}")]
    IndexUnavailable(#[from] FetchError),
    #[error("no listings found on {0}")]
    NoListings(String),
}

#[derive(Debug, Error)]
enum ListingError {
    #[error("listing has no detail link")]
    NoDetailUrl,
    #[error("duplicate check failed: {0}")]
    Lookup(StoreError),
    #[error("detail page unavailable: {0}")]
    Fetch(#[from] FetchError),
    #[error("detail page has no text")]
    EmptyText,
    #[error(transparent)]
    Summarize(#[from] SummarizeError),
    #[error("insert failed: {0}")]
    Insert(StoreError),
}

enum Outcome {
    Inserted(i64),
    Duplicate,
}

pub struct ScrapePipeline {
    fetcher: Arc<dyn PageFetcher>,
    summarizer: Arc<dyn Summarizer>,
    store: Arc<dyn JobStore>,
    site: Site,
}

impl ScrapePipeline {
    pub fn new(
        fetcher: Arc<dyn PageFetcher>,
        summarizer: Arc<dyn Summarizer>,
        store: Arc<dyn JobStore>,
        site: Site,
    ) -> Self {
        Self {
            fetcher,
            summarizer,
            store,
            site,
        }
    }

    /// Fetch the index, then process each listing in document order.
    ///
    /// Only a missing or empty index ends the run early; a listing that fails
    /// at any step is logged, counted in [`RunReport::failed`] and skipped.
    pub async fn run(&self) -> Result<RunReport, PipelineError> {
        let index_html = match self.fetcher.fetch(&self.site.listings_url).await {
            Ok(html) => html,
            Err(e) => {
                warn!(url = %self.site.listings_url, error = %e, "index fetch failed, aborting run");
                return Err(e.into());
            }
        };

        let listings = parse_listings(&index_html, &self.site.base_url);
        if listings.is_empty() {
            warn!(url = %self.site.listings_url, "no listings found, aborting run");
            return Err(PipelineError::NoListings(self.site.listings_url.clone()));
        }
        info!("Found {} listings", listings.len());

        let mut report = RunReport {
            listings: listings.len(),
            ..Default::default()
        };

        for listing in &listings {
            debug!(url = %listing.detail_url, "checking listing");
            match self.process_listing(listing).await {
                Ok(Outcome::Inserted(id)) => {
                    report.inserted += 1;
                    info!(id, title = %listing.title, url = %listing.detail_url, "saved listing");
                }
                Ok(Outcome::Duplicate) => {
                    report.duplicates += 1;
                    debug!(url = %listing.detail_url, "already stored, skipped");
                }
                Err(e) => {
                    report.failed += 1;
                    warn!(url = %listing.detail_url, error = %e, "skipping listing");
                }
            }
        }

        info!(
            "Run done: {} listings ({} saved, {} duplicates, {} failed)",
            report.listings, report.inserted, report.duplicates, report.failed
        );
        Ok(report)
    }

    async fn process_listing(&self, listing: &JobListing) -> Result<Outcome, ListingError> {
        if !listing.has_detail_url() {
            return Err(ListingError::NoDetailUrl);
        }

        if self
            .store
            .exists(&listing.detail_url)
            .await
            .map_err(ListingError::Lookup)?
        {
            return Ok(Outcome::Duplicate);
        }

        let detail_html = self.fetcher.fetch(&listing.detail_url).await?;
        let text = extract_text(&detail_html);
        if text.is_empty() {
            return Err(ListingError::EmptyText);
        }

        let summary = self.summarizer.summarize(&text).await?;

        let record = JobRecord {
            title: listing.title.clone(),
            company: listing.company.clone(),
            location: listing.location.clone(),
            detail_url: listing.detail_url.clone(),
            summary,
            category: categorize(&listing.title).to_string(),
            created_at: Utc::now(),
        };

        match self.store.insert(&record).await {
            Ok(id) => Ok(Outcome::Inserted(id)),
            // Lost a race with an overlapping writer; the record is there.
            Err(StoreError::Duplicate(_)) => Ok(Outcome::Duplicate),
            Err(e) => Err(ListingError::Insert(e)),
        }
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::db::SqliteStore;
    use async_trait::async_trait;
    use std::collections::HashMap;
    use std::sync::Mutex;

    pub const INDEX_URL: &str = "https://www.mediacongo.net/emplois/";
    pub const BASE_URL: &str = "https://www.mediacongo.net";

    /// Serves canned pages and records every URL requested.
    pub struct FakeFetcher {
        pages: HashMap<String, String>,
        calls: Mutex<Vec<String>>,
    }

    impl FakeFetcher {
        pub fn new(pages: &[(&str, &str)]) -> Self {
            Self {
                pages: pages
                    .iter()
                    .map(|(url, html)| (url.to_string(), html.to_string()))
                    .collect(),
                calls: Mutex::new(Vec::new()),
            }
        }

        pub fn calls_to(&self, url: &str) -> usize {
            self.calls.lock().unwrap().iter().filter(|u| *u == url).count()
        }
    }

    #[async_trait]
    impl PageFetcher for FakeFetcher {
        async fn fetch(&self, url: &str) -> Result<String, FetchError> {
            self.calls.lock().unwrap().push(url.to_string());
            self.pages.get(url).cloned().ok_or(FetchError::Status {
                url: url.to_string(),
                status: 404,
            })
        }
    }

    /// Answers "Role summary." unless the text contains `fail_marker`,
    /// in which case it behaves like an endpoint returning HTTP 500.
    pub struct FakeSummarizer {
        fail_marker: Option<&'static str>,
        calls: Mutex<usize>,
    }

    impl FakeSummarizer {
        pub fn ok() -> Self {
            Self {
                fail_marker: None,
                calls: Mutex::new(0),
            }
        }

        pub fn failing_on(marker: &'static str) -> Self {
            Self {
                fail_marker: Some(marker),
                calls: Mutex::new(0),
            }
        }

        pub fn calls(&self) -> usize {
            *self.calls.lock().unwrap()
        }
    }

    #[async_trait]
    impl Summarizer for FakeSummarizer {
        async fn summarize(&self, job_text: &str) -> Result<String, SummarizeError> {
            *self.calls.lock().unwrap() += 1;
            match self.fail_marker {
                Some(marker) if job_text.contains(marker) => Err(SummarizeError::Status(500)),
                _ => Ok("Role summary.".to_string()),
            }
        }
    }

    pub fn card(title: &str, anchor_text: &str, href: &str) -> String {
        format!(
            r#"<div class="Cols3_item"><p>{}</p><a href="{}">{}</a></div>"#,
            title, href, anchor_text
        )
    }

    pub fn index(cards: &[String]) -> String {
        format!(
            r#"<html><body><div class="Cols3">{}</div></body></html>"#,
            cards.concat()
        )
    }

    pub fn detail(body: &str) -> String {
        format!(
            "<html><head><script>track()</script></head><body><header>Menu</header><p>{}</p></body></html>",
            body
        )
    }

    pub fn pipeline(
        fetcher: &Arc<FakeFetcher>,
        summarizer: &Arc<FakeSummarizer>,
        store: &Arc<SqliteStore>,
    ) -> ScrapePipeline {
        ScrapePipeline::new(
            fetcher.clone(),
            summarizer.clone(),
            store.clone(),
            Site {
                listings_url: INDEX_URL.to_string(),
                base_url: BASE_URL.to_string(),
            },
        )
    }

    fn url(path: &str) -> String {
        format!("{}{}", BASE_URL, path)
    }

    #[tokio::test]
    async fn single_listing_becomes_record() {
        let index_html = index(&[card("Développeur Web", "Acme Corp\nKinshasa", "/job/42")]);
        let detail_html = detail("Nous recherchons un développeur.");
        let job_url = url("/job/42");
        let fetcher = Arc::new(FakeFetcher::new(&[
            (INDEX_URL, index_html.as_str()),
            (job_url.as_str(), detail_html.as_str()),
        ]));
        let summarizer = Arc::new(FakeSummarizer::ok());
        let store = Arc::new(SqliteStore::in_memory().unwrap());

        let report = pipeline(&fetcher, &summarizer, &store).run().await.unwrap();
        assert_eq!(
            report,
            RunReport {
                listings: 1,
                inserted: 1,
                duplicates: 0,
                failed: 0
            }
        );

        let records = store.recent(None, 10).unwrap();
        assert_eq!(records.len(), 1);
        let r = &records[0];
        assert_eq!(r.title, "Développeur Web");
        assert_eq!(r.company, "Acme Corp");
        assert_eq!(r.location, "Kinshasa");
        assert_eq!(r.detail_url, "https://www.mediacongo.net/job/42");
        assert_eq!(r.summary, "Role summary.");
        assert_eq!(r.category, "Informatique / IT");
    }

    #[tokio::test]
    async fn second_run_inserts_nothing_new() {
        let index_html = index(&[
            card("Comptable", "Banque\nGoma", "/job/1"),
            card("Chauffeur", "Trans SARL\nMatadi", "/job/2"),
            card("Infirmier", "Clinique\nKinshasa", "/job/3"),
        ]);
        let pages: Vec<(String, String)> = (1..=3)
            .map(|i| (url(&format!("/job/{}", i)), detail(&format!("Offre {}", i))))
            .collect();
        let mut all: Vec<(&str, &str)> = vec![(INDEX_URL, index_html.as_str())];
        all.extend(pages.iter().map(|(u, h)| (u.as_str(), h.as_str())));

        let fetcher = Arc::new(FakeFetcher::new(&all));
        let summarizer = Arc::new(FakeSummarizer::ok());
        let store = Arc::new(SqliteStore::in_memory().unwrap());
        let pipeline = pipeline(&fetcher, &summarizer, &store);

        let first = pipeline.run().await.unwrap();
        assert_eq!(first.inserted, 3);

        let second = pipeline.run().await.unwrap();
        assert_eq!(second.inserted, 0);
        assert_eq!(second.duplicates, 3);

        assert_eq!(store.count().unwrap(), 3);
        for (u, _) in &pages {
            assert_eq!(fetcher.calls_to(u), 1, "{} fetched more than once", u);
        }
        assert_eq!(summarizer.calls(), 3);
    }

    #[tokio::test]
    async fn summarizer_failure_skips_only_that_listing() {
        let index_html = index(&[
            card("Magasinier", "Depot\nMatadi", "/job/1"),
            card("Consultant", "Cabinet\nKinshasa", "/job/2"),
        ]);
        let broken = detail("BROKEN offer");
        let fine = detail("Fine offer");
        let (u1, u2) = (url("/job/1"), url("/job/2"));
        let fetcher = Arc::new(FakeFetcher::new(&[
            (INDEX_URL, index_html.as_str()),
            (u1.as_str(), broken.as_str()),
            (u2.as_str(), fine.as_str()),
        ]));
        let summarizer = Arc::new(FakeSummarizer::failing_on("BROKEN"));
        let store = Arc::new(SqliteStore::in_memory().unwrap());

        let report = pipeline(&fetcher, &summarizer, &store).run().await.unwrap();
        assert_eq!(report.failed, 1);
        assert_eq!(report.inserted, 1);
        assert!(!store.exists(&u1).await.unwrap());
        assert!(store.exists(&u2).await.unwrap());
        assert_eq!(summarizer.calls(), 2);
    }

    #[tokio::test]
    async fn stored_url_is_not_fetched_again() {
        let index_html = index(&[
            card("Architecte", "Bureau\nKinshasa", "/job/1"),
            card("Pharmacien", "Pharma\nBukavu", "/job/2"),
        ]);
        let (u1, u2) = (url("/job/1"), url("/job/2"));
        let d1 = detail("One");
        let d2 = detail("Two");
        let fetcher = Arc::new(FakeFetcher::new(&[
            (INDEX_URL, index_html.as_str()),
            (u1.as_str(), d1.as_str()),
            (u2.as_str(), d2.as_str()),
        ]));
        let summarizer = Arc::new(FakeSummarizer::ok());
        let store = Arc::new(SqliteStore::in_memory().unwrap());
        store
            .insert(&JobRecord {
                title: "Architecte".into(),
                company: "Bureau".into(),
                location: "Kinshasa".into(),
                detail_url: u1.clone(),
                summary: "Earlier.".into(),
                category: "Ingénierie / BTP".into(),
                created_at: Utc::now(),
            })
            .await
            .unwrap();

        let report = pipeline(&fetcher, &summarizer, &store).run().await.unwrap();
        assert_eq!(report.duplicates, 1);
        assert_eq!(report.inserted, 1);
        assert_eq!(fetcher.calls_to(&u1), 0);
        assert_eq!(fetcher.calls_to(&u2), 1);
        assert_eq!(summarizer.calls(), 1);
    }

    #[tokio::test]
    async fn unusable_listings_are_skipped_and_loop_continues() {
        let index_html = index(&[
            // no anchor at all
            r#"<div class="Cols3_item"><p>Sans lien</p></div>"#.to_string(),
            // detail page missing
            card("Caissier", "Shop\nGoma", "/job/missing"),
            // detail page with nothing but chrome
            card("Graphiste", "Studio\nKinshasa", "/job/empty"),
            card("Journaliste", "Radio\nKinshasa", "/job/ok"),
        ]);
        let empty = "<html><body><header>Menu</header><script>x()</script></body></html>";
        let ok = detail("Reportage");
        let (u_empty, u_ok) = (url("/job/empty"), url("/job/ok"));
        let fetcher = Arc::new(FakeFetcher::new(&[
            (INDEX_URL, index_html.as_str()),
            (u_empty.as_str(), empty),
            (u_ok.as_str(), ok.as_str()),
        ]));
        let summarizer = Arc::new(FakeSummarizer::ok());
        let store = Arc::new(SqliteStore::in_memory().unwrap());

        let report = pipeline(&fetcher, &summarizer, &store).run().await.unwrap();
        assert_eq!(
            report,
            RunReport {
                listings: 4,
                inserted: 1,
                duplicates: 0,
                failed: 3
            }
        );
        assert_eq!(summarizer.calls(), 1);
        assert_eq!(store.recent(None, 10).unwrap()[0].category, "Communication / Marketing");
    }

    #[tokio::test]
    async fn index_failure_aborts_run() {
        let fetcher = Arc::new(FakeFetcher::new(&[]));
        let summarizer = Arc::new(FakeSummarizer::ok());
        let store = Arc::new(SqliteStore::in_memory().unwrap());

        let err = pipeline(&fetcher, &summarizer, &store).run().await.unwrap_err();
        assert!(matches!(err, PipelineError::IndexUnavailable(_)));
        assert_eq!(fetcher.calls_to(INDEX_URL), 1);
        assert_eq!(summarizer.calls(), 0);
    }

    #[tokio::test]
    async fn empty_index_aborts_run() {
        let fetcher = Arc::new(FakeFetcher::new(&[(INDEX_URL, "<html><body></body></html>")]));
        let summarizer = Arc::new(FakeSummarizer::ok());
        let store = Arc::new(SqliteStore::in_memory().unwrap());

        let err = pipeline(&fetcher, &summarizer, &store).run().await.unwrap_err();
        assert!(matches!(err, PipelineError::NoListings(_)));
        assert_eq!(store.count().unwrap(), 0);
    }
}
