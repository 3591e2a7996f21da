//! Incremental list loading with a single-flight guard.
//!
//! A [`ListLoader`] is seeded with the server-rendered first page and fetches the
//! following pages on demand, appending them in server order.
//!
//! ```text
//!              load_more()                      fetch ok, n > 0
//! has_more ───────────────> is_loading ──────────────────────────> append, page += 1,
//!    │                          │                                 has_more = len < total
//!    │                          ├── fetch ok, n == 0 ──> has_more = false (terminal)
//!    │                          └── fetch err ────────> has_more = false (terminal)
//!    └── !has_more / is_loading ──> no-op
//! ```
//!
//! Both trigger sources (button and viewport intersection) go through the same
//! guarded entry point, so racing triggers collapse into a single request.

use std::sync::Arc;

use async_trait::async_trait;
use metrics::counter;
use parking_lot::Mutex;
use serde::Serialize;
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;

use crate::analytics::{Tracker, TrackingEvent};
use crate::config::SiteConfig;
use crate::domain::ListPage;
use crate::error::Result;

pub mod trigger;

pub use trigger::{IntersectionEntry, IntersectionWatch, Trigger};

/// Source of pages for a loader.
#[async_trait]
pub trait PageSource<T: Send + 'static>: Send + Sync {
    /// Fetch page `page` (1-based) holding at most `limit` items.
    async fn fetch_page(&self, page: u32, limit: u32) -> Result<ListPage<T>>;

    /// Short name used in logs, metrics and analytics.
    fn name(&self) -> &str {
        "list"
    }
}

#[async_trait]
impl<T, S> PageSource<T> for Arc<S>
where
    T: Send + 'static,
    S: PageSource<T> + ?Sized,
{
    async fn fetch_page(&self, page: u32, limit: u32) -> Result<ListPage<T>> {
        (**self).fetch_page(page, limit).await
    }

    fn name(&self) -> &str {
        (**self).name()
    }
}

/// Observable state of a loader.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LoaderState<T> {
    pub loaded_items: Vec<T>,
    /// Count of all matching items, as reported with the seed page
    pub total: u64,
    /// Next page to request (page 1 is the seed)
    pub current_page: u32,
    pub has_more: bool,
    pub is_loading: bool,
}

/// What a call to [`ListLoader::load_more`] did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoadOutcome {
    /// A fetch was already in flight; nothing was requested.
    Busy,
    /// The loader had nothing more to load; nothing was requested.
    Exhausted,
    /// The page was appended.
    Appended { count: usize },
    /// The server returned an empty page; the loader is now exhausted.
    EndOfList,
    /// The loader was unmounted while the fetch was in flight; the result was dropped.
    Detached,
}

/// Progressive loader over a [`PageSource`].
pub struct ListLoader<T, S> {
    source: S,
    page_size: u32,
    state: Mutex<LoaderState<T>>,
    updates: watch::Sender<LoaderState<T>>,
    mounted: CancellationToken,
    tracker: Option<Tracker>,
}

impl<T, S> ListLoader<T, S>
where
    T: Clone + Send + Sync + 'static,
    S: PageSource<T>,
{
    /// Create a loader from the first page that was rendered with the view.
    pub fn new(source: S, seed: ListPage<T>, page_size: u32) -> Self {
        let seed = seed.normalized();
        let has_more = (seed.items.len() as u64) < seed.total;
        let state = LoaderState {
            loaded_items: seed.items,
            total: seed.total,
            current_page: 2,
            has_more,
            is_loading: false,
        };

        tracing::debug!(
            source = source.name(),
            seeded = state.loaded_items.len(),
            total = state.total,
            has_more,
            "List loader mounted"
        );

        let (updates, _) = watch::channel(state.clone());
        Self {
            source,
            page_size,
            state: Mutex::new(state),
            updates,
            mounted: CancellationToken::new(),
            tracker: None,
        }
    }

    /// Like [`new`](Self::new), requesting `config.page_size` items per page.
    pub fn from_config(source: S, seed: ListPage<T>, config: &SiteConfig) -> Self {
        Self::new(source, seed, config.page_size)
    }

    pub fn page_size(&self) -> u32 {
        self.page_size
    }

    /// Emit a `blog_load_more` analytics event after every appended page.
    pub fn with_tracker(mut self, tracker: Tracker) -> Self {
        self.tracker = Some(tracker);
        self
    }

    /// Receive a snapshot after every state change.
    pub fn subscribe(&self) -> watch::Receiver<LoaderState<T>> {
        self.updates.subscribe()
    }

    pub fn snapshot(&self) -> LoaderState<T> {
        self.state.lock().clone()
    }

    pub fn has_more(&self) -> bool {
        self.state.lock().has_more
    }

    pub fn is_loading(&self) -> bool {
        self.state.lock().is_loading
    }

    pub fn len(&self) -> usize {
        self.state.lock().loaded_items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Route a trigger into [`load_more`](Self::load_more).
    pub async fn trigger(&self, trigger: Trigger) -> Result<LoadOutcome> {
        tracing::trace!(source = self.source.name(), ?trigger, "Load more triggered");
        self.load_more().await
    }

    /// Fetch and append the next page.
    ///
    /// A no-op while another fetch is in flight or once the list is exhausted.
    /// A failed fetch ends loading for the rest of the loader's life and the error
    /// is returned to the caller.
    pub async fn load_more(&self) -> Result<LoadOutcome> {
        let page = {
            let mut state = self.state.lock();
            if state.is_loading {
                return Ok(LoadOutcome::Busy);
            }
            if !state.has_more || self.mounted.is_cancelled() {
                return Ok(LoadOutcome::Exhausted);
            }
            state.is_loading = true;
            self.updates.send_replace(state.clone());
            state.current_page
        };

        // Clears `is_loading` on every exit path, including a dropped future
        let _guard = LoadingGuard {
            state: &self.state,
            updates: &self.updates,
        };

        let source = self.source.name();
        tracing::debug!(source, page, limit = self.page_size, "Loading next page");

        let result = self.source.fetch_page(page, self.page_size).await;

        if self.mounted.is_cancelled() {
            tracing::debug!(source, page, "Loader unmounted, discarding page");
            return Ok(LoadOutcome::Detached);
        }

        let fetched = match result {
            Ok(fetched) => fetched,
            Err(e) => {
                counter!(
                    "kaizen_list_load_failures_total",
                    "source" => source.to_string(),
                    "kind" => e.kind().as_str()
                )
                .increment(1);
                tracing::warn!(source, page, error = %e, "Failed to load more items, giving up");
                self.state.lock().has_more = false;
                return Err(e);
            }
        };

        let mut state = self.state.lock();
        if fetched.items.is_empty() {
            tracing::debug!(source, page, "Server returned an empty page, list exhausted");
            state.has_more = false;
            return Ok(LoadOutcome::EndOfList);
        }

        let count = fetched.items.len();
        state.loaded_items.extend(fetched.items);
        state.current_page += 1;
        state.has_more = (state.loaded_items.len() as u64) < state.total;

        counter!("kaizen_list_pages_loaded_total", "source" => source.to_string()).increment(1);
        tracing::debug!(
            source,
            page,
            appended = count,
            loaded = state.loaded_items.len(),
            total = state.total,
            has_more = state.has_more,
            "Appended page"
        );

        if let Some(tracker) = &self.tracker {
            tracker.track(TrackingEvent::ListLoadMore {
                source: source.to_string(),
                page,
                total: state.total,
            });
        }

        Ok(LoadOutcome::Appended { count })
    }

    /// Mark the owning view as gone. Any fetch still in flight is ignored when it
    /// resolves and no further fetches are issued.
    pub fn unmount(&self) {
        tracing::debug!(source = self.source.name(), "List loader unmounted");
        self.mounted.cancel();
    }
}

/// Resets `is_loading` and publishes the final state when dropped.
struct LoadingGuard<'a, T: Clone> {
    state: &'a Mutex<LoaderState<T>>,
    updates: &'a watch::Sender<LoaderState<T>>,
}

impl<T: Clone> Drop for LoadingGuard<'_, T> {
    fn drop(&mut self) {
        let mut state = self.state.lock();
        state.is_loading = false;
        self.updates.send_replace(state.clone());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::KaizenError;
    use std::collections::VecDeque;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Serves scripted pages and counts requests.
    struct ScriptedSource {
        pages: Mutex<VecDeque<Result<ListPage<u32>>>>,
        requested: Mutex<Vec<u32>>,
        calls: AtomicUsize,
    }

    impl ScriptedSource {
        fn new(pages: Vec<Result<ListPage<u32>>>) -> Self {
            Self {
                pages: Mutex::new(pages.into()),
                requested: Mutex::new(Vec::new()),
                calls: AtomicUsize::new(0),
            }
        }
    }

    #[async_trait]
    impl PageSource<u32> for ScriptedSource {
        async fn fetch_page(&self, page: u32, _limit: u32) -> Result<ListPage<u32>> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.requested.lock().push(page);
            self.pages
                .lock()
                .pop_front()
                .unwrap_or_else(|| Ok(ListPage::empty()))
        }
    }

    fn range(from: u32, to: u32, total: u64) -> ListPage<u32> {
        ListPage::new((from..to).collect(), total)
    }

    #[tokio::test]
    async fn test_seed_sets_initial_state() {
        let loader = ListLoader::new(ScriptedSource::new(vec![]), range(0, 12, 30), 12);
        let state = loader.snapshot();
        assert_eq!(state.current_page, 2);
        assert!(state.has_more);
        assert!(!state.is_loading);
        assert_eq!(state.loaded_items.len(), 12);
    }

    #[tokio::test]
    async fn test_appends_until_total_reached() {
        let source = Arc::new(ScriptedSource::new(vec![
            Ok(range(12, 24, 30)),
            Ok(range(24, 30, 30)),
        ]));
        let loader = ListLoader::new(source.clone(), range(0, 12, 30), 12);

        assert_eq!(
            loader.load_more().await.unwrap(),
            LoadOutcome::Appended { count: 12 }
        );
        assert!(loader.has_more());
        assert_eq!(
            loader.load_more().await.unwrap(),
            LoadOutcome::Appended { count: 6 }
        );
        assert!(!loader.has_more());
        assert_eq!(loader.load_more().await.unwrap(), LoadOutcome::Exhausted);

        let state = loader.snapshot();
        assert_eq!(state.loaded_items, (0..30).collect::<Vec<_>>());
        assert_eq!(state.current_page, 4);
        assert_eq!(*source.requested.lock(), vec![2, 3]);
    }

    #[tokio::test]
    async fn test_empty_page_ends_list_despite_total() {
        let source = Arc::new(ScriptedSource::new(vec![Ok(ListPage::new(vec![], 30))]));
        let loader = ListLoader::new(source.clone(), range(0, 12, 30), 12);

        assert_eq!(loader.load_more().await.unwrap(), LoadOutcome::EndOfList);
        assert!(!loader.has_more());
        assert_eq!(loader.load_more().await.unwrap(), LoadOutcome::Exhausted);
        assert_eq!(source.calls.load(Ordering::SeqCst), 1);
        assert_eq!(loader.snapshot().current_page, 2);
    }

    #[tokio::test]
    async fn test_failure_is_terminal_and_resets_loading() {
        let source = Arc::new(ScriptedSource::new(vec![Err(KaizenError::HttpStatus {
            status: 503,
            body: String::new(),
        })]));
        let loader = ListLoader::new(source.clone(), range(0, 12, 30), 12);

        let err = loader.load_more().await.unwrap_err();
        assert!(matches!(err, KaizenError::HttpStatus { status: 503, .. }));
        assert!(!loader.has_more());
        assert!(!loader.is_loading());

        assert_eq!(loader.load_more().await.unwrap(), LoadOutcome::Exhausted);
        assert_eq!(source.calls.load(Ordering::SeqCst), 1);
        assert_eq!(loader.len(), 12);
    }

    #[tokio::test]
    async fn test_subscribers_see_loading_cleared() {
        let source = ScriptedSource::new(vec![Ok(range(12, 24, 30))]);
        let loader = ListLoader::new(source, range(0, 12, 30), 12);
        let mut rx = loader.subscribe();

        loader.load_more().await.unwrap();

        assert!(rx.has_changed().unwrap());
        let state = rx.borrow_and_update().clone();
        assert!(!state.is_loading);
        assert_eq!(state.loaded_items.len(), 24);
    }

    #[tokio::test]
    async fn test_unmounted_loader_does_not_fetch() {
        let source = Arc::new(ScriptedSource::new(vec![Ok(range(12, 24, 30))]));
        let loader = ListLoader::new(source.clone(), range(0, 12, 30), 12);

        loader.unmount();

        assert_eq!(loader.load_more().await.unwrap(), LoadOutcome::Exhausted);
        assert_eq!(source.calls.load(Ordering::SeqCst), 0);
    }
}
