//! Chunk-at-a-time crawling.
//!
//! Links are split into pagination chunks up front. A chunk is fetched when
//! the reviewer navigates to it, while a background task fills the remaining
//! chunks one by one whenever no navigation fetch is running.

use crate::crawlers::Fetcher;
use crate::crawlers::batch::{BatchOptions, crawl_links};
use crate::results::{CHUNK_SIZE, Dataset, PageRecord};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;
use tokio::sync::Notify;
use tokio::task::JoinHandle;

#[derive(Debug, Clone)]
enum Slot {
    Pending,
    InFlight,
    Ready(Vec<PageRecord>),
}

struct Shared<F> {
    fetcher: Arc<F>,
    options: BatchOptions,
    links: Vec<Vec<String>>,
    slots: Mutex<Vec<Slot>>,
    /// Navigations currently running; the pre-fetcher waits while non-zero
    navigations: AtomicUsize,
    chunk_ready: Notify,
}

impl<F: Fetcher> Shared<F> {
    fn slots(&self) -> MutexGuard<'_, Vec<Slot>> {
        self.slots.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Moves a pending slot to in-flight. Only one caller can win a slot.
    fn claim(&self, index: usize) -> bool {
        let mut slots = self.slots();
        match slots.get(index) {
            Some(Slot::Pending) => {
                slots[index] = Slot::InFlight;
                true
            }
            _ => false,
        }
    }

    fn ready(&self, index: usize) -> Option<Vec<PageRecord>> {
        match self.slots().get(index) {
            Some(Slot::Ready(records)) => Some(records.clone()),
            _ => None,
        }
    }

    fn next_pending(&self) -> Option<usize> {
        self.slots()
            .iter()
            .position(|slot| matches!(slot, Slot::Pending))
    }

    async fn fill(&self, index: usize) -> Vec<PageRecord> {
        let records = crawl_links(self.fetcher.as_ref(), &self.links[index], &self.options).await;
        self.slots()[index] = Slot::Ready(records.clone());
        self.chunk_ready.notify_waiters();
        records
    }
}

/// Counts one running navigation for as long as it lives
struct NavigationGuard<'a>(&'a AtomicUsize);

impl<'a> NavigationGuard<'a> {
    fn enter(counter: &'a AtomicUsize) -> Self {
        counter.fetch_add(1, Ordering::SeqCst);
        Self(counter)
    }
}

impl Drop for NavigationGuard<'_> {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

/// Dataset whose chunks are fetched on demand
pub struct LazyDataset<F> {
    shared: Arc<Shared<F>>,
}

impl<F> Clone for LazyDataset<F> {
    fn clone(&self) -> Self {
        Self {
            shared: Arc::clone(&self.shared),
        }
    }
}

impl<F: Fetcher + 'static> LazyDataset<F> {
    pub fn new(fetcher: Arc<F>, links: Vec<String>, options: BatchOptions) -> Self {
        let links = links
            .chunks(CHUNK_SIZE)
            .map(<[String]>::to_vec)
            .collect::<Vec<_>>();
        let slots = vec![Slot::Pending; links.len()];

        Self {
            shared: Arc::new(Shared {
                fetcher,
                options,
                links,
                slots: Mutex::new(slots),
                navigations: AtomicUsize::new(0),
                chunk_ready: Notify::new(),
            }),
        }
    }

    pub fn total_pages(&self) -> usize {
        self.shared.links.len()
    }

    /// Returns the records of a 1-based page, fetching the chunk first if no
    /// one has. If the pre-fetcher already claimed it, waits for that fetch.
    pub async fn navigate(&self, page: usize) -> Option<Vec<PageRecord>> {
        let index = page.checked_sub(1).filter(|index| *index < self.total_pages())?;
        let shared = &self.shared;

        let _navigation = NavigationGuard::enter(&shared.navigations);
        let records = loop {
            let notified = shared.chunk_ready.notified();

            if let Some(records) = shared.ready(index) {
                break records;
            }

            if shared.claim(index) {
                ::log::debug!("Fetching page {} on demand", page);
                break shared.fill(index).await;
            }

            ::log::debug!("Page {} is being pre-fetched, waiting", page);
            notified.await;
        };

        Some(records)
    }

    /// Starts the background pre-fetcher. After each quiet period it fetches
    /// the next unclaimed chunk, skipping the round while a navigation fetch is
    /// running. The task ends once every chunk is claimed.
    pub fn spawn_prefetch(&self, quiet: Duration) -> JoinHandle<()> {
        let shared = Arc::clone(&self.shared);

        tokio::spawn(async move {
            loop {
                tokio::time::sleep(quiet).await;

                if shared.navigations.load(Ordering::SeqCst) > 0 {
                    ::log::trace!("Navigation in flight, pre-fetcher yields");
                    continue;
                }

                let Some(index) = shared.next_pending() else {
                    ::log::debug!("Pre-fetcher has no chunks left");
                    break;
                };

                if shared.claim(index) {
                    ::log::debug!("Pre-fetching page {}", index + 1);
                    shared.fill(index).await;
                }
            }
        })
    }

    /// Number of chunks whose records are available
    pub fn ready_pages(&self) -> usize {
        self.shared
            .slots()
            .iter()
            .filter(|slot| matches!(slot, Slot::Ready(_)))
            .count()
    }

    /// The complete dataset, once every chunk has been fetched
    pub fn snapshot(&self) -> Option<Dataset> {
        self.shared
            .slots()
            .iter()
            .map(|slot| match slot {
                Slot::Ready(records) => Some(records.clone()),
                _ => None,
            })
            .collect::<Option<Vec<_>>>()
            .map(Dataset::from_chunks)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crawlers::FetchedResource;
    use crate::crawlers::testing::{MockFetcher, page_with_images};
    use crate::error::FetchError;
    use tokio::sync::Semaphore;

    /// Fetcher whose requests block until the test opens the gate
    struct GatedFetcher {
        inner: MockFetcher,
        gate: Semaphore,
        started: Notify,
        issued: AtomicUsize,
    }

    impl GatedFetcher {
        fn issued(&self) -> usize {
            self.issued.load(Ordering::SeqCst)
        }

        fn open(&self) {
            self.gate.add_permits(1_000);
        }
    }

    impl Fetcher for GatedFetcher {
        async fn fetch(&self, url: &str) -> Result<FetchedResource, FetchError> {
            self.issued.fetch_add(1, Ordering::SeqCst);
            self.started.notify_one();
            self.gate
                .acquire()
                .await
                .map_err(|e| FetchError::Request(e.to_string()))?
                .forget();
            self.inner.fetch(url).await
        }
    }

    fn gated_site(pages: usize) -> (Arc<GatedFetcher>, Vec<String>) {
        let (inner, links) = site(pages);
        let inner = Arc::try_unwrap(inner).unwrap_or_else(|_| panic!("fetcher is shared"));
        let fetcher = GatedFetcher {
            inner,
            gate: Semaphore::new(0),
            started: Notify::new(),
            issued: AtomicUsize::new(0),
        };
        (Arc::new(fetcher), links)
    }

    fn site(pages: usize) -> (Arc<MockFetcher>, Vec<String>) {
        let mut fetcher = MockFetcher::new();
        let mut links = Vec::new();
        for n in 0..pages {
            let link = format!("https://e.com/{n}");
            fetcher = fetcher.with_html(&link, &page_with_images(&format!("P{n}"), &["/x.png"]));
            links.push(link);
        }
        (Arc::new(fetcher), links)
    }

    fn quick() -> BatchOptions {
        BatchOptions {
            delay: Duration::ZERO,
            ..BatchOptions::default()
        }
    }

    #[tokio::test]
    async fn test_navigate_fetches_only_that_chunk() {
        let (fetcher, links) = site(25);
        let lazy = LazyDataset::new(Arc::clone(&fetcher), links, quick());
        assert_eq!(lazy.total_pages(), 3);

        let records = lazy.navigate(2).await.unwrap();
        assert_eq!(records.len(), 10);
        assert_eq!(records[0].page_link(), "https://e.com/10");
        assert_eq!(fetcher.requests().len(), 10);
        assert_eq!(lazy.ready_pages(), 1);
        assert!(lazy.snapshot().is_none());

        // Revisiting does not fetch again
        lazy.navigate(2).await.unwrap();
        assert_eq!(fetcher.requests().len(), 10);

        assert!(lazy.navigate(0).await.is_none());
        assert!(lazy.navigate(4).await.is_none());
    }

    #[tokio::test]
    async fn test_prefetch_fills_every_chunk_once() {
        let (fetcher, links) = site(25);
        let lazy = LazyDataset::new(Arc::clone(&fetcher), links.clone(), quick());

        let first = lazy.navigate(1).await.unwrap();
        assert_eq!(first.len(), 10);

        let prefetch = lazy.spawn_prefetch(Duration::from_millis(1));
        let last = lazy.navigate(3).await.unwrap();
        assert_eq!(last.len(), 5);
        prefetch.await.unwrap();

        let dataset = lazy.snapshot().expect("all chunks fetched");
        assert_eq!(dataset.total_pages(), 3);
        assert_eq!(dataset.records().count(), 25);
        for link in &links {
            assert_eq!(fetcher.request_count(link), 1, "{link} fetched more than once");
        }
    }

    #[tokio::test]
    async fn test_prefetch_yields_while_navigation_in_flight() {
        let (fetcher, links) = gated_site(11);
        let lazy = LazyDataset::new(Arc::clone(&fetcher), links, quick());

        let navigation = tokio::spawn({
            let lazy = lazy.clone();
            async move { lazy.navigate(2).await }
        });
        fetcher.started.notified().await;

        let prefetch = lazy.spawn_prefetch(Duration::from_millis(1));
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert_eq!(fetcher.issued(), 1, "pre-fetcher ran during a navigation");
        assert_eq!(lazy.ready_pages(), 0);

        fetcher.open();
        let records = navigation.await.unwrap().unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].page_link(), "https://e.com/10");

        prefetch.await.unwrap();
        assert_eq!(lazy.ready_pages(), 2);
        assert_eq!(fetcher.issued(), 11);
    }

    #[tokio::test]
    async fn test_navigation_waits_for_prefetched_chunk() {
        let (fetcher, links) = gated_site(1);
        let lazy = LazyDataset::new(Arc::clone(&fetcher), links, quick());

        let prefetch = lazy.spawn_prefetch(Duration::from_millis(1));
        fetcher.started.notified().await;

        let navigation = tokio::spawn({
            let lazy = lazy.clone();
            async move { lazy.navigate(1).await }
        });
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(!navigation.is_finished());
        assert_eq!(fetcher.issued(), 1);

        fetcher.open();
        let records = navigation.await.unwrap().unwrap();
        assert_eq!(records[0].page_link(), "https://e.com/0");
        prefetch.await.unwrap();
        assert_eq!(fetcher.issued(), 1, "chunk fetched twice");
    }

    #[tokio::test]
    async fn test_overlapping_navigations_keep_prefetch_paused() {
        let (fetcher, links) = gated_site(21);
        let lazy = LazyDataset::new(Arc::clone(&fetcher), links, quick());

        let navigate = |page| {
            let lazy = lazy.clone();
            tokio::spawn(async move { lazy.navigate(page).await })
        };
        let third = navigate(3);
        fetcher.started.notified().await;
        let first = navigate(1);
        tokio::time::sleep(Duration::from_millis(10)).await;
        assert_eq!(lazy.shared.navigations.load(Ordering::SeqCst), 2);

        fetcher.open();
        first.await.unwrap().unwrap();
        third.await.unwrap().unwrap();
        assert_eq!(lazy.shared.navigations.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_claim_is_exclusive() {
        let (fetcher, links) = site(5);
        let lazy = LazyDataset::new(fetcher, links, quick());
        assert!(lazy.shared.claim(0));
        assert!(!lazy.shared.claim(0));
        assert!(!lazy.shared.claim(1));
    }
}
