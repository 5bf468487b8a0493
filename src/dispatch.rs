//! The dedup-and-dispatch cycle.
//!
//! One call to [`Dispatcher::run_cycle`] performs a full pass:
//!
//! 1. **Fetch** the feed page. Failure ends the cycle without side effects.
//! 2. **Load** the sent-links record.
//! 3. **Filter and notify** every entry in page order. Malformed entries and
//!    links already in the record are skipped; new articles are delivered one
//!    at a time with a fixed pause after each attempt.
//! 4. **Persist** the loaded record plus every link delivered in this cycle.
//!
//! Membership is checked against the record as loaded in step 2, so the same
//! link appearing twice on one page is delivered twice. A link is recorded only
//! after its delivery succeeded, which gives at-least-once semantics: a crash
//! between delivery and step 4 re-sends, it never loses.

use crate::config::ReadFailurePolicy;
use crate::models::FeedEntry;
use crate::notifier::Notifier;
use crate::scrapers::FeedFetcher;
use crate::store::{SentSet, SentStore};
use crate::utils::truncate_for_log;
use std::time::Duration;
use tokio::time::sleep;
use tracing::{error, info, instrument, warn};

/// How a cycle ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CycleOutcome {
    /// The feed page could not be retrieved.
    FetchFailed,
    /// The page held no article cards.
    EmptyFeed,
    /// The record exists but could not be read and the policy is to skip.
    RecordUnreadable,
    /// Every entry was considered.
    Completed,
}

/// Counters describing one cycle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CycleReport {
    pub outcome: CycleOutcome,
    /// Entries found on the page, well-formed or not.
    pub found: usize,
    /// Entries skipped for a missing title or link.
    pub malformed: usize,
    /// Entries whose link was already recorded.
    pub already_sent: usize,
    pub delivered: usize,
    pub failed: usize,
    /// Whether the record was written successfully at the end of the cycle.
    pub saved: bool,
}

impl CycleReport {
    fn ended(outcome: CycleOutcome, found: usize) -> Self {
        Self {
            outcome,
            found,
            malformed: 0,
            already_sent: 0,
            delivered: 0,
            failed: 0,
            saved: false,
        }
    }
}

/// Runs cycles against one feed and one notifier.
#[derive(Debug)]
pub struct Dispatcher<F, N> {
    fetcher: F,
    notifier: N,
    store: SentStore,
    inter_item_delay: Duration,
    read_failure_policy: ReadFailurePolicy,
}

impl<F, N> Dispatcher<F, N>
where
    F: FeedFetcher,
    N: Notifier,
{
    pub fn new(
        fetcher: F,
        notifier: N,
        store: SentStore,
        inter_item_delay: Duration,
        read_failure_policy: ReadFailurePolicy,
    ) -> Self {
        Self {
            fetcher,
            notifier,
            store,
            inter_item_delay,
            read_failure_policy,
        }
    }

    #[cfg(test)]
    pub(crate) fn notifier(&self) -> &N {
        &self.notifier
    }

    /// Run one fetch, filter, notify, persist pass.
    ///
    /// Every failure is logged and reflected in the returned report; nothing
    /// propagates to the caller.
    #[instrument(level = "info", skip_all)]
    pub async fn run_cycle(&self) -> CycleReport {
        let entries = match self.fetcher.fetch().await {
            Ok(entries) => entries,
            Err(e) => {
                error!(error = %e, "Feed fetch failed; skipping cycle");
                return CycleReport::ended(CycleOutcome::FetchFailed, 0);
            }
        };

        if entries.is_empty() {
            warn!("No articles on the feed page");
            return CycleReport::ended(CycleOutcome::EmptyFeed, 0);
        }
        info!(count = entries.len(), "Found articles on the feed page");

        let sent = match self.store.load().await {
            Ok(sent) => sent,
            Err(e) => match self.read_failure_policy {
                ReadFailurePolicy::FailOpen => {
                    error!(error = %e, "Cannot read sent links; continuing with an empty record");
                    SentSet::new()
                }
                ReadFailurePolicy::SkipCycle => {
                    error!(error = %e, "Cannot read sent links; skipping cycle");
                    return CycleReport::ended(CycleOutcome::RecordUnreadable, entries.len());
                }
            },
        };

        let mut report = CycleReport::ended(CycleOutcome::Completed, entries.len());
        let delivered = self.dispatch_entries(entries, &sent, &mut report).await;

        let mut updated = sent;
        updated.extend(delivered);
        match self.store.save(&updated).await {
            Ok(()) => report.saved = true,
            Err(e) => error!(error = %e, "Cannot save sent links; progress of this cycle is lost"),
        }

        info!(
            found = report.found,
            delivered = report.delivered,
            failed = report.failed,
            already_sent = report.already_sent,
            malformed = report.malformed,
            saved = report.saved,
            "Cycle complete"
        );
        report
    }

    /// Deliver every new article, returning the links that went through.
    async fn dispatch_entries(
        &self,
        entries: Vec<FeedEntry>,
        sent: &SentSet,
        report: &mut CycleReport,
    ) -> Vec<String> {
        let mut delivered = Vec::new();

        for (index, entry) in entries.into_iter().enumerate() {
            let article = match entry.into_article() {
                Ok(article) => article,
                Err(e) => {
                    warn!(index, reason = %e, "Skipping malformed entry");
                    report.malformed += 1;
                    continue;
                }
            };

            if sent.contains(&article.link) {
                info!(title = %truncate_for_log(&article.title, 80), "Already sent");
                report.already_sent += 1;
                continue;
            }

            info!(
                title = %truncate_for_log(&article.title, 80),
                link = %article.link,
                "Sending article"
            );
            match self.notifier.notify(&article.to_message()).await {
                Ok(()) => {
                    report.delivered += 1;
                    delivered.push(article.link);
                }
                Err(e) => {
                    error!(link = %article.link, error = %e, "Delivery failed; will retry next cycle");
                    report.failed += 1;
                }
            }

            sleep(self.inter_item_delay).await;
        }

        delivered
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::models::Message;
    use crate::notifier::NotifyError;
    use crate::scrapers::FetchError;
    use reqwest::StatusCode;
    use std::collections::HashSet;
    use std::sync::Mutex;
    use tempfile::TempDir;
    use tokio::time::Instant;

    const DELAY: Duration = Duration::from_secs(2);

    /// Serves a fixed page, or fails when `entries` is `None`.
    pub(crate) struct StaticFeed {
        pub entries: Mutex<Option<Vec<FeedEntry>>>,
    }

    impl StaticFeed {
        pub fn new(entries: Vec<FeedEntry>) -> Self {
            Self {
                entries: Mutex::new(Some(entries)),
            }
        }

        pub fn failing() -> Self {
            Self {
                entries: Mutex::new(None),
            }
        }
    }

    impl FeedFetcher for StaticFeed {
        async fn fetch(&self) -> Result<Vec<FeedEntry>, FetchError> {
            self.entries
                .lock()
                .unwrap()
                .clone()
                .ok_or_else(|| FetchError::Status {
                    url: "https://habr.com/ru/feed/".into(),
                    status: StatusCode::BAD_GATEWAY,
                })
        }
    }

    /// Records every message; fails for messages mentioning a link in `fail_links`.
    #[derive(Default)]
    pub(crate) struct RecordingNotifier {
        pub calls: Mutex<Vec<(String, Instant)>>,
        pub fail_links: Mutex<HashSet<String>>,
    }

    impl RecordingNotifier {
        pub fn failing_for(links: &[&str]) -> Self {
            Self {
                calls: Mutex::new(Vec::new()),
                fail_links: Mutex::new(links.iter().map(|l| l.to_string()).collect()),
            }
        }

        pub fn texts(&self) -> Vec<String> {
            self.calls
                .lock()
                .unwrap()
                .iter()
                .map(|(text, _)| text.clone())
                .collect()
        }
    }

    impl Notifier for RecordingNotifier {
        async fn notify(&self, message: &Message) -> Result<(), NotifyError> {
            self.calls
                .lock()
                .unwrap()
                .push((message.text.clone(), Instant::now()));

            let fails = self
                .fail_links
                .lock()
                .unwrap()
                .iter()
                .any(|link| message.text.contains(&format!("href='{link}'")));
            if fails {
                Err(NotifyError::Api {
                    status: StatusCode::TOO_MANY_REQUESTS,
                    description: "Too Many Requests".into(),
                })
            } else {
                Ok(())
            }
        }
    }

    pub(crate) fn article(id: &str) -> FeedEntry {
        FeedEntry {
            title: Some(format!("Article {id}")),
            link: Some(format!("https://habr.com/ru/articles/{id}/")),
            description: Some(format!("About {id}")),
        }
    }

    fn link(id: &str) -> String {
        format!("https://habr.com/ru/articles/{id}/")
    }

    fn dispatcher(
        feed: StaticFeed,
        notifier: RecordingNotifier,
        dir: &TempDir,
    ) -> Dispatcher<StaticFeed, RecordingNotifier> {
        Dispatcher::new(
            feed,
            notifier,
            SentStore::new(dir.path().join("sent_links.txt")),
            DELAY,
            ReadFailurePolicy::SkipCycle,
        )
    }

    fn write_record(dir: &TempDir, links: &[String]) {
        let set: SentSet = links.iter().cloned().collect();
        std::fs::write(dir.path().join("sent_links.txt"), set.to_record()).unwrap();
    }

    fn read_record(dir: &TempDir) -> Vec<String> {
        std::fs::read_to_string(dir.path().join("sent_links.txt"))
            .unwrap()
            .lines()
            .map(String::from)
            .collect()
    }

    #[tokio::test(start_paused = true)]
    async fn test_new_articles_are_sent_in_order_and_sent_ones_skipped() {
        let dir = TempDir::new().unwrap();
        write_record(&dir, &[link("old"), link("b")]);
        let d = dispatcher(
            StaticFeed::new(vec![article("a"), article("b"), article("c")]),
            RecordingNotifier::default(),
            &dir,
        );

        let report = d.run_cycle().await;

        let calls = d.notifier.calls.lock().unwrap().clone();
        assert_eq!(calls.len(), 2);
        assert!(calls[0].0.contains(&link("a")));
        assert!(calls[1].0.contains(&link("c")));
        assert!(calls[1].1 - calls[0].1 >= DELAY);

        assert_eq!(read_record(&dir), vec![link("old"), link("b"), link("a"), link("c")]);
        assert_eq!(report.outcome, CycleOutcome::Completed);
        assert_eq!(report.found, 3);
        assert_eq!(report.delivered, 2);
        assert_eq!(report.already_sent, 1);
        assert!(report.saved);
    }

    #[tokio::test(start_paused = true)]
    async fn test_second_cycle_is_idempotent() {
        let dir = TempDir::new().unwrap();
        let d = dispatcher(
            StaticFeed::new(vec![article("a"), article("b")]),
            RecordingNotifier::default(),
            &dir,
        );

        let first = d.run_cycle().await;
        assert_eq!(first.delivered, 2);

        let second = d.run_cycle().await;
        assert_eq!(second.delivered, 0);
        assert_eq!(second.already_sent, 2);
        assert_eq!(d.notifier.texts().len(), 2);
        assert_eq!(read_record(&dir), vec![link("a"), link("b")]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_failed_delivery_is_not_recorded_and_retried() {
        let dir = TempDir::new().unwrap();
        write_record(&dir, &[link("old")]);
        let a = link("a");
        let d = dispatcher(
            StaticFeed::new(vec![article("a"), article("c")]),
            RecordingNotifier::failing_for(&[a.as_str()]),
            &dir,
        );

        let report = d.run_cycle().await;
        assert_eq!(report.failed, 1);
        assert_eq!(report.delivered, 1);
        assert_eq!(read_record(&dir), vec![link("old"), link("c")]);

        d.notifier.fail_links.lock().unwrap().clear();
        let retry = d.run_cycle().await;
        assert_eq!(retry.delivered, 1);
        assert_eq!(retry.already_sent, 1);

        let texts = d.notifier.texts();
        assert_eq!(texts.len(), 3);
        assert!(texts[2].contains(&a));
        assert_eq!(read_record(&dir), vec![link("old"), link("c"), link("a")]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_empty_feed_leaves_record_untouched() {
        let dir = TempDir::new().unwrap();
        write_record(&dir, &[link("old")]);
        let d = dispatcher(StaticFeed::new(Vec::new()), RecordingNotifier::default(), &dir);

        let report = d.run_cycle().await;

        assert_eq!(report.outcome, CycleOutcome::EmptyFeed);
        assert!(d.notifier.texts().is_empty());
        assert_eq!(read_record(&dir), vec![link("old")]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_fetch_failure_has_no_side_effects() {
        let dir = TempDir::new().unwrap();
        let d = dispatcher(StaticFeed::failing(), RecordingNotifier::default(), &dir);

        let report = d.run_cycle().await;

        assert_eq!(report.outcome, CycleOutcome::FetchFailed);
        assert!(d.notifier.texts().is_empty());
        assert!(!dir.path().join("sent_links.txt").exists());
    }

    #[tokio::test(start_paused = true)]
    async fn test_malformed_entry_is_skipped_without_stopping() {
        let dir = TempDir::new().unwrap();
        let untitled = FeedEntry {
            title: None,
            ..article("x")
        };
        let unlinked = FeedEntry {
            link: None,
            ..article("y")
        };
        let d = dispatcher(
            StaticFeed::new(vec![untitled, article("a"), unlinked, article("b")]),
            RecordingNotifier::default(),
            &dir,
        );

        let report = d.run_cycle().await;

        assert_eq!(report.malformed, 2);
        assert_eq!(report.delivered, 2);
        assert_eq!(read_record(&dir), vec![link("a"), link("b")]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_missing_record_starts_empty() {
        let dir = TempDir::new().unwrap();
        let d = dispatcher(
            StaticFeed::new(vec![article("a")]),
            RecordingNotifier::default(),
            &dir,
        );

        let report = d.run_cycle().await;

        assert_eq!(report.outcome, CycleOutcome::Completed);
        assert_eq!(report.delivered, 1);
        assert_eq!(read_record(&dir), vec![link("a")]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_delay_only_after_delivery_attempts() {
        let dir = TempDir::new().unwrap();
        write_record(&dir, &[link("a"), link("b")]);
        let d = dispatcher(
            StaticFeed::new(vec![article("a"), article("b"), article("c")]),
            RecordingNotifier::default(),
            &dir,
        );

        let start = Instant::now();
        d.run_cycle().await;

        assert_eq!(start.elapsed(), DELAY);
    }

    #[tokio::test(start_paused = true)]
    async fn test_duplicate_links_within_one_page_are_both_sent() {
        let dir = TempDir::new().unwrap();
        let d = dispatcher(
            StaticFeed::new(vec![article("a"), article("a")]),
            RecordingNotifier::default(),
            &dir,
        );

        let report = d.run_cycle().await;

        assert_eq!(report.delivered, 2);
        assert_eq!(d.notifier.texts().len(), 2);
        assert_eq!(read_record(&dir), vec![link("a")]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_unreadable_record_skips_cycle_by_default() {
        let dir = TempDir::new().unwrap();
        // A directory where the record file should be cannot be read.
        std::fs::create_dir(dir.path().join("sent_links.txt")).unwrap();
        let d = dispatcher(
            StaticFeed::new(vec![article("a")]),
            RecordingNotifier::default(),
            &dir,
        );

        let report = d.run_cycle().await;

        assert_eq!(report.outcome, CycleOutcome::RecordUnreadable);
        assert!(d.notifier.texts().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_unreadable_record_fails_open_when_configured() {
        let dir = TempDir::new().unwrap();
        std::fs::create_dir(dir.path().join("sent_links.txt")).unwrap();
        let d = Dispatcher::new(
            StaticFeed::new(vec![article("a")]),
            RecordingNotifier::default(),
            SentStore::new(dir.path().join("sent_links.txt")),
            DELAY,
            ReadFailurePolicy::FailOpen,
        );

        let report = d.run_cycle().await;

        assert_eq!(report.outcome, CycleOutcome::Completed);
        assert_eq!(report.delivered, 1);
        // Saving over a directory fails; the cycle still completes.
        assert!(!report.saved);
    }
}
