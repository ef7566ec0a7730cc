use crate::collection::MovieCollection;
use crate::error::{CatalogError, FetchError};
use crate::models::{Movie, MoviePage};
use crate::sentinel::{LoadNext, Rearm};
use crate::tmdb::MovieSource;
use async_trait::async_trait;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use tracing::{debug, info, warn};

/// Presentation side of the catalog. Called with the controller's state lock
/// held, so implementations must not call back into the controller.
pub trait CatalogView: Send + Sync {
    fn show_skeleton(&self);
    fn hide_skeleton(&self);
    /// Replace everything on screen with `movies`.
    fn render_list(&self, movies: &[Movie]);
    /// Add `movies` after what is already on screen.
    fn append_items(&self, movies: &[Movie]);
    fn set_load_more_visible(&self, visible: bool);
    fn show_error(&self, error: &FetchError);
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BrowseMode {
    Popular,
    Search,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BrowsingState {
    pub mode: BrowseMode,
    pub page: u32,
    pub keyword: Option<String>,
    pub total_pages: Option<u32>,
}

impl BrowsingState {
    fn first_page(mode: BrowseMode, keyword: Option<String>) -> Self {
        Self {
            mode,
            page: 1,
            keyword,
            total_pages: None,
        }
    }

    pub fn has_more(&self) -> bool {
        self.total_pages.map_or(true, |total| self.page < total)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoadState {
    Idle,
    Loading,
    Ready,
}

/// Snapshot of the request that produced a response. A response is applied
/// only while its token is still the one in flight.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchToken {
    pub epoch: u64,
    pub mode: BrowseMode,
    pub keyword: Option<String>,
    pub page: u32,
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum InFlight {
    Switch(FetchToken),
    Page(FetchToken),
}

impl InFlight {
    fn token(&self) -> &FetchToken {
        match self {
            InFlight::Switch(t) | InFlight::Page(t) => t,
        }
    }
}

#[derive(Debug)]
struct Inner {
    state: BrowsingState,
    load: LoadState,
    collection: MovieCollection,
    epoch: u64,
    in_flight: Option<InFlight>,
}

impl Inner {
    fn is_current(&self, token: &FetchToken) -> bool {
        self.in_flight.as_ref().map(InFlight::token) == Some(token)
    }

    fn settle(&mut self) {
        self.in_flight = None;
        self.load = LoadState::Ready;
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CatalogSnapshot {
    pub state: BrowsingState,
    pub load: LoadState,
    pub busy: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SwitchOutcome {
    Applied,
    /// A later switch took over before the response arrived; it was dropped.
    Superseded,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoadOutcome {
    Loaded { added: usize },
    Busy,
    /// The first page has not been loaded for the current mode.
    NotReady,
    Exhausted,
    /// The source returned nothing for the next page; pagination is closed.
    EndReached,
}

pub struct CatalogController {
    source: Arc<dyn MovieSource>,
    view: Arc<dyn CatalogView>,
    timeout: Option<Duration>,
    inner: Mutex<Inner>,
}

impl CatalogController {
    pub fn new(source: Arc<dyn MovieSource>, view: Arc<dyn CatalogView>) -> Self {
        Self {
            source,
            view,
            timeout: None,
            inner: Mutex::new(Inner {
                state: BrowsingState::first_page(BrowseMode::Popular, None),
                load: LoadState::Idle,
                collection: MovieCollection::new(),
                epoch: 0,
                in_flight: None,
            }),
        }
    }

    /// Bound every fetch; an expired fetch fails with `FetchError::Timeout`.
    pub fn with_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self
    }

    pub async fn init(&self) -> Result<(), CatalogError> {
        info!("Loading popular catalog");
        self.switch(BrowseMode::Popular, None).await.map(|_| ())
    }

    pub async fn switch_to_popular(&self) -> Result<SwitchOutcome, CatalogError> {
        self.switch(BrowseMode::Popular, None).await
    }

    pub async fn switch_to_search(&self, keyword: &str) -> Result<SwitchOutcome, CatalogError> {
        let keyword = keyword.trim();
        if keyword.is_empty() {
            return Err(CatalogError::InvalidInput);
        }
        self.switch(BrowseMode::Search, Some(keyword.to_string()))
            .await
    }

    pub async fn load_more(&self) -> Result<LoadOutcome, CatalogError> {
        let token = {
            let mut inner = self.lock();
            if inner.in_flight.is_some() {
                return Ok(LoadOutcome::Busy);
            }
            let Some(total) = inner.state.total_pages else {
                return Ok(LoadOutcome::NotReady);
            };
            if inner.state.page >= total {
                return Ok(LoadOutcome::Exhausted);
            }
            let token = FetchToken {
                epoch: inner.epoch,
                mode: inner.state.mode,
                keyword: inner.state.keyword.clone(),
                page: inner.state.page + 1,
            };
            inner.in_flight = Some(InFlight::Page(token.clone()));
            inner.load = LoadState::Loading;
            self.view.show_skeleton();
            token
        };

        debug!(epoch = token.epoch, page = token.page, mode = ?token.mode, "Fetching next page");
        let result = self.fetch(&token).await;

        let mut inner = self.lock();
        // A page load is never superseded: `switch` refuses while it is in flight.
        debug_assert!(inner.is_current(&token));
        inner.settle();
        self.view.hide_skeleton();

        let page = match result {
            Ok(page) => page,
            Err(e) => {
                warn!("Failed to load page {}: {}", token.page, e);
                self.view.show_error(&e);
                return Err(e.into());
            }
        };

        if page.results.is_empty() {
            info!(
                "No results for page {}, closing pagination at page {}",
                token.page, inner.state.page
            );
            inner.state.total_pages = Some(inner.state.page);
            self.view.set_load_more_visible(false);
            return Ok(LoadOutcome::EndReached);
        }

        inner.state.page = token.page;
        inner.state.total_pages = Some(page.total_pages.max(token.page));
        let added = inner.collection.append(page.results);
        self.view.append_items(&added);
        self.view.set_load_more_visible(inner.state.has_more());
        debug!(
            page = inner.state.page,
            total_pages = ?inner.state.total_pages,
            added = added.len(),
            "Appended page"
        );
        Ok(LoadOutcome::Loaded { added: added.len() })
    }

    pub fn snapshot(&self) -> CatalogSnapshot {
        let inner = self.lock();
        CatalogSnapshot {
            state: inner.state.clone(),
            load: inner.load,
            busy: inner.in_flight.is_some(),
        }
    }

    pub fn movies(&self) -> Vec<Movie> {
        self.lock().collection.list().to_vec()
    }

    async fn switch(
        &self,
        mode: BrowseMode,
        keyword: Option<String>,
    ) -> Result<SwitchOutcome, CatalogError> {
        let token = {
            let mut inner = self.lock();
            match &inner.in_flight {
                Some(InFlight::Page(_)) => return Err(CatalogError::Busy),
                Some(InFlight::Switch(previous)) => {
                    debug!(epoch = previous.epoch, "Superseding in-flight switch");
                }
                None => {}
            }
            inner.epoch += 1;
            inner.state = BrowsingState::first_page(mode, keyword);
            inner.collection.clear();
            inner.load = LoadState::Loading;
            let token = FetchToken {
                epoch: inner.epoch,
                mode,
                keyword: inner.state.keyword.clone(),
                page: 1,
            };
            inner.in_flight = Some(InFlight::Switch(token.clone()));
            self.view.render_list(&[]);
            self.view.set_load_more_visible(true);
            self.view.show_skeleton();
            token
        };

        info!(mode = ?token.mode, keyword = ?token.keyword, "Switching catalog mode");
        let result = self.fetch(&token).await;

        let mut inner = self.lock();
        if !inner.is_current(&token) {
            debug!(epoch = token.epoch, "Discarding stale switch response");
            return Ok(SwitchOutcome::Superseded);
        }
        inner.settle();
        self.view.hide_skeleton();

        // An empty first page is reported as a failure, not as "no results".
        let page = match result.and_then(non_empty) {
            Ok(page) => page,
            Err(e) => {
                warn!("Failed to load {:?} catalog: {}", token.mode, e);
                self.view.set_load_more_visible(false);
                self.view.show_error(&e);
                return Err(e.into());
            }
        };

        inner.state.total_pages = Some(page.total_pages.max(1));
        inner.collection.reset(page.results);
        self.view.render_list(inner.collection.list());
        self.view.set_load_more_visible(inner.state.has_more());
        info!(
            "Loaded {} movies ({} pages)",
            inner.collection.len(),
            page.total_pages
        );
        Ok(SwitchOutcome::Applied)
    }

    async fn fetch(&self, token: &FetchToken) -> Result<MoviePage, FetchError> {
        let request = async {
            match token.mode {
                BrowseMode::Popular => self.source.fetch_popular_page(token.page).await,
                BrowseMode::Search => {
                    let keyword = token.keyword.as_deref().unwrap_or_default();
                    self.source.fetch_search_page(token.page, keyword).await
                }
            }
        };
        match self.timeout {
            Some(limit) => tokio::time::timeout(limit, request)
                .await
                .map_err(|_| FetchError::Timeout(limit))?,
            None => request.await,
        }
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

fn non_empty(page: MoviePage) -> Result<MoviePage, FetchError> {
    if page.results.is_empty() {
        Err(FetchError::EmptyResults { status: 200 })
    } else {
        Ok(page)
    }
}

#[async_trait]
impl LoadNext for CatalogController {
    async fn load_next(&self) -> Rearm {
        match self.load_more().await {
            Ok(LoadOutcome::Loaded { .. }) | Ok(LoadOutcome::Busy) => Rearm::Now,
            Ok(outcome) => {
                debug!(?outcome, "Sentinel load produced no new page");
                Rearm::OnViewportChange
            }
            Err(_) => Rearm::OnViewportChange,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn has_more_until_last_page() {
        let mut state = BrowsingState::first_page(BrowseMode::Popular, None);
        assert!(state.has_more());
        state.total_pages = Some(2);
        assert!(state.has_more());
        state.page = 2;
        assert!(!state.has_more());
    }

    #[test]
    fn token_equality_includes_epoch() {
        let a = FetchToken {
            epoch: 1,
            mode: BrowseMode::Popular,
            keyword: None,
            page: 1,
        };
        let b = FetchToken { epoch: 3, ..a.clone() };
        let inner = Inner {
            state: BrowsingState::first_page(BrowseMode::Popular, None),
            load: LoadState::Loading,
            collection: MovieCollection::new(),
            epoch: 3,
            in_flight: Some(InFlight::Switch(b.clone())),
        };
        assert!(!inner.is_current(&a));
        assert!(inner.is_current(&b));
    }

    #[test]
    fn empty_first_page_is_an_error() {
        let empty = MoviePage {
            results: vec![],
            total_pages: 0,
        };
        assert_eq!(
            non_empty(empty).unwrap_err(),
            FetchError::EmptyResults { status: 200 }
        );
    }
}
