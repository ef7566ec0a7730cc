use movielist::catalog::{
    BrowseMode, CatalogController, CatalogView, LoadOutcome, LoadState, SwitchOutcome,
};
use movielist::error::{CatalogError, FetchError, StatusClass};
use movielist::models::{Movie, MoviePage};
use movielist::sentinel::{ScrollSentinel, Viewport};
use movielist::tmdb::MovieSource;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::{oneshot, watch};

#[derive(Default)]
struct FakeSource {
    popular: HashMap<u32, MoviePage>,
    search: HashMap<(String, u32), MoviePage>,
    calls: Mutex<Vec<String>>,
    gates: Mutex<HashMap<String, oneshot::Receiver<()>>>,
    failures: Mutex<HashMap<String, FetchError>>,
}

impl FakeSource {
    /// Holds the next request for `key` until the returned sender fires or drops.
    fn hold(&self, key: &str) -> oneshot::Sender<()> {
        let (tx, rx) = oneshot::channel();
        self.gates.lock().unwrap().insert(key.to_string(), rx);
        tx
    }

    fn fail_once(&self, key: &str, error: FetchError) {
        self.failures.lock().unwrap().insert(key.to_string(), error);
    }

    fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    fn count(&self, key: &str) -> usize {
        self.calls().iter().filter(|c| c.as_str() == key).count()
    }

    async fn respond(&self, key: String, page: Option<MoviePage>) -> Result<MoviePage, FetchError> {
        self.calls.lock().unwrap().push(key.clone());
        let gate = self.gates.lock().unwrap().remove(&key);
        if let Some(gate) = gate {
            let _ = gate.await;
        }
        let failure = self.failures.lock().unwrap().remove(&key);
        if let Some(err) = failure {
            return Err(err);
        }
        Ok(page.unwrap_or(MoviePage {
            results: vec![],
            total_pages: 0,
        }))
    }
}

#[async_trait::async_trait]
impl MovieSource for FakeSource {
    async fn fetch_popular_page(&self, page: u32) -> Result<MoviePage, FetchError> {
        self.respond(format!("popular:{page}"), self.popular.get(&page).cloned())
            .await
    }

    async fn fetch_search_page(&self, page: u32, keyword: &str) -> Result<MoviePage, FetchError> {
        let found = self.search.get(&(keyword.to_string(), page)).cloned();
        self.respond(format!("search:{keyword}:{page}"), found).await
    }

    async fn fetch_movie_detail(&self, movie_id: i32) -> Result<movielist::models::MovieDetail, FetchError> {
        Err(FetchError::status(if movie_id > 0 { 404 } else { 400 }))
    }
}

#[derive(Debug, Clone, PartialEq)]
enum ViewEvent {
    Skeleton,
    HideSkeleton,
    Render(Vec<i32>),
    Append(Vec<i32>),
    LoadMore(bool),
    Error(FetchError),
}

#[derive(Default)]
struct RecordingView {
    events: Mutex<Vec<ViewEvent>>,
}

impl RecordingView {
    fn events(&self) -> Vec<ViewEvent> {
        self.events.lock().unwrap().clone()
    }

    fn load_more_visible(&self) -> Option<bool> {
        self.events().into_iter().rev().find_map(|e| match e {
            ViewEvent::LoadMore(v) => Some(v),
            _ => None,
        })
    }

    fn errors(&self) -> Vec<FetchError> {
        self.events()
            .into_iter()
            .filter_map(|e| match e {
                ViewEvent::Error(err) => Some(err),
                _ => None,
            })
            .collect()
    }

    fn push(&self, event: ViewEvent) {
        self.events.lock().unwrap().push(event);
    }
}

fn ids(movies: &[Movie]) -> Vec<i32> {
    movies.iter().map(|m| m.id).collect()
}

impl CatalogView for RecordingView {
    fn show_skeleton(&self) {
        self.push(ViewEvent::Skeleton);
    }
    fn hide_skeleton(&self) {
        self.push(ViewEvent::HideSkeleton);
    }
    fn render_list(&self, movies: &[Movie]) {
        self.push(ViewEvent::Render(ids(movies)));
    }
    fn append_items(&self, movies: &[Movie]) {
        self.push(ViewEvent::Append(ids(movies)));
    }
    fn set_load_more_visible(&self, visible: bool) {
        self.push(ViewEvent::LoadMore(visible));
    }
    fn show_error(&self, error: &FetchError) {
        self.push(ViewEvent::Error(error.clone()));
    }
}

fn movie(id: i32) -> Movie {
    Movie {
        id,
        title: format!("Movie {id}"),
        poster_path: Some(format!("/{id}.jpg")),
        vote_average: 7.5,
    }
}

fn page(ids: impl IntoIterator<Item = i32>, total_pages: u32) -> MoviePage {
    MoviePage {
        results: ids.into_iter().map(movie).collect(),
        total_pages,
    }
}

fn controller(source: FakeSource) -> (Arc<CatalogController>, Arc<FakeSource>, Arc<RecordingView>) {
    let source = Arc::new(source);
    let view = Arc::new(RecordingView::default());
    let controller = Arc::new(CatalogController::new(source.clone(), view.clone()));
    (controller, source, view)
}

fn five_page_feed() -> FakeSource {
    let mut source = FakeSource::default();
    source.popular.insert(1, page(1..=20, 5));
    source.popular.insert(2, page(21..=40, 5));
    // 40 repeats from page 2
    source.popular.insert(3, page((41..=59).chain([40]), 5));
    source.popular.insert(4, page(61..=80, 5));
    source.popular.insert(5, page(81..=100, 5));
    source
}

async fn wait_for_call(source: &FakeSource, key: &str) {
    while source.count(key) == 0 {
        tokio::task::yield_now().await;
    }
}

#[tokio::test]
async fn init_and_pagination_hide_affordance_exactly_on_last_page() {
    let (catalog, _source, view) = controller(five_page_feed());

    assert_eq!(catalog.snapshot().load, LoadState::Idle);
    catalog.init().await.unwrap();
    let snap = catalog.snapshot();
    assert_eq!(snap.state.mode, BrowseMode::Popular);
    assert_eq!(snap.state.page, 1);
    assert_eq!(snap.state.total_pages, Some(5));
    assert_eq!(snap.load, LoadState::Ready);
    assert_eq!(catalog.movies().len(), 20);
    assert_eq!(view.load_more_visible(), Some(true));

    for _ in 0..3 {
        let outcome = catalog.load_more().await.unwrap();
        assert!(matches!(outcome, LoadOutcome::Loaded { .. }));
        assert_eq!(view.load_more_visible(), Some(true));
    }
    assert_eq!(catalog.snapshot().state.page, 4);
    assert_eq!(catalog.movies().len(), 20 + 20 + 19 + 20);

    let outcome = catalog.load_more().await.unwrap();
    assert_eq!(outcome, LoadOutcome::Loaded { added: 20 });
    assert_eq!(catalog.snapshot().state.page, 5);
    assert_eq!(view.load_more_visible(), Some(false));

    let all = ids(&catalog.movies());
    let mut unique = all.clone();
    unique.sort_unstable();
    unique.dedup();
    assert_eq!(unique.len(), all.len());
    assert_eq!(&all[..3], &[1, 2, 3]);
}

#[tokio::test]
async fn load_more_on_last_page_is_noop() {
    let mut source = FakeSource::default();
    source.popular.insert(1, page(1..=3, 1));
    let (catalog, source, view) = controller(source);
    catalog.init().await.unwrap();
    assert_eq!(view.load_more_visible(), Some(false));

    let before = catalog.movies();
    let calls = source.calls().len();
    assert_eq!(catalog.load_more().await.unwrap(), LoadOutcome::Exhausted);
    assert_eq!(catalog.movies(), before);
    assert_eq!(catalog.snapshot().state.page, 1);
    assert_eq!(source.calls().len(), calls);
}

#[tokio::test]
async fn stale_popular_response_does_not_touch_search_results() {
    let mut source = FakeSource::default();
    source.popular.insert(1, page(1..=5, 3));
    source.search.insert(("x".to_string(), 1), page(900..=902, 1));
    let gate = source.hold("popular:1");
    let (catalog, source, view) = controller(source);

    let slow = tokio::spawn({
        let catalog = catalog.clone();
        async move { catalog.switch_to_popular().await }
    });
    wait_for_call(&source, "popular:1").await;

    let outcome = catalog.switch_to_search("x").await.unwrap();
    assert_eq!(outcome, SwitchOutcome::Applied);
    assert_eq!(ids(&catalog.movies()), vec![900, 901, 902]);

    gate.send(()).unwrap();
    let late = slow.await.unwrap().unwrap();
    assert_eq!(late, SwitchOutcome::Superseded);

    let snap = catalog.snapshot();
    assert_eq!(snap.state.mode, BrowseMode::Search);
    assert_eq!(snap.state.keyword.as_deref(), Some("x"));
    assert!(!snap.busy);
    assert_eq!(ids(&catalog.movies()), vec![900, 901, 902]);
    assert!(!view.events().contains(&ViewEvent::Render(vec![1, 2, 3, 4, 5])));
}

#[tokio::test]
async fn switch_is_rejected_while_a_page_load_is_in_flight() {
    let mut source = FakeSource::default();
    source.popular.insert(1, page(1..=2, 3));
    source.popular.insert(2, page(3..=4, 3));
    let gate = source.hold("popular:2");
    let (catalog, source, _view) = controller(source);
    catalog.init().await.unwrap();

    let pending = tokio::spawn({
        let catalog = catalog.clone();
        async move { catalog.load_more().await }
    });
    wait_for_call(&source, "popular:2").await;

    assert!(catalog.snapshot().busy);
    assert!(matches!(
        catalog.switch_to_search("x").await,
        Err(CatalogError::Busy)
    ));
    assert_eq!(catalog.load_more().await.unwrap(), LoadOutcome::Busy);
    assert_eq!(catalog.snapshot().state.mode, BrowseMode::Popular);
    assert_eq!(source.count("popular:2"), 1);
    assert_eq!(source.count("search:x:1"), 0);

    gate.send(()).unwrap();
    assert_eq!(
        pending.await.unwrap().unwrap(),
        LoadOutcome::Loaded { added: 2 }
    );
    assert_eq!(ids(&catalog.movies()), vec![1, 2, 3, 4]);
    assert_eq!(catalog.snapshot().state.page, 2);
    assert!(!catalog.snapshot().busy);
}

#[tokio::test]
async fn blank_keyword_is_rejected_without_fetching() {
    let mut source = FakeSource::default();
    source.popular.insert(1, page(1..=2, 2));
    let (catalog, source, _view) = controller(source);
    catalog.init().await.unwrap();
    let before = catalog.snapshot();
    let calls = source.calls().len();

    assert!(matches!(
        catalog.switch_to_search("   ").await,
        Err(CatalogError::InvalidInput)
    ));
    assert_eq!(catalog.snapshot(), before);
    assert_eq!(source.calls().len(), calls);
    assert_eq!(ids(&catalog.movies()), vec![1, 2]);
}

#[tokio::test]
async fn search_trims_keyword_and_paginates_with_it() {
    let mut source = FakeSource::default();
    source
        .search
        .insert(("matrix".to_string(), 1), page(10..=11, 2));
    source
        .search
        .insert(("matrix".to_string(), 2), page(12..=13, 2));
    let (catalog, source, view) = controller(source);

    catalog.switch_to_search("  matrix ").await.unwrap();
    assert_eq!(
        catalog.snapshot().state.keyword.as_deref(),
        Some("matrix")
    );
    catalog.load_more().await.unwrap();
    assert_eq!(
        source.calls(),
        vec!["search:matrix:1".to_string(), "search:matrix:2".to_string()]
    );
    assert!(view.events().contains(&ViewEvent::Append(vec![12, 13])));
    assert_eq!(view.load_more_visible(), Some(false));
}

#[tokio::test]
async fn empty_first_page_is_reported_as_error() {
    let (catalog, _source, view) = controller(FakeSource::default());

    let err = catalog.switch_to_search("nothing").await.unwrap_err();
    assert!(matches!(
        err,
        CatalogError::Fetch(FetchError::EmptyResults { status: 200 })
    ));
    assert_eq!(
        view.errors(),
        vec![FetchError::EmptyResults { status: 200 }]
    );
    assert_eq!(view.errors()[0].class(), Some(StatusClass::Success));
    assert!(!catalog.snapshot().busy);
    assert_eq!(view.load_more_visible(), Some(false));
    assert_eq!(catalog.load_more().await.unwrap(), LoadOutcome::NotReady);
}

#[tokio::test]
async fn empty_next_page_closes_pagination_quietly() {
    let mut source = FakeSource::default();
    source.popular.insert(1, page(1..=3, 4));
    let (catalog, source, view) = controller(source);
    catalog.init().await.unwrap();

    assert_eq!(catalog.load_more().await.unwrap(), LoadOutcome::EndReached);
    let snap = catalog.snapshot();
    assert_eq!(snap.state.page, 1);
    assert_eq!(snap.state.total_pages, Some(1));
    assert_eq!(ids(&catalog.movies()), vec![1, 2, 3]);
    assert!(view.errors().is_empty());
    assert_eq!(view.load_more_visible(), Some(false));

    assert_eq!(catalog.load_more().await.unwrap(), LoadOutcome::Exhausted);
    assert_eq!(source.count("popular:2"), 1);
}

#[tokio::test]
async fn failed_page_leaves_state_intact_and_can_be_retried() {
    let mut source = FakeSource::default();
    source.popular.insert(1, page(1..=2, 3));
    source.popular.insert(2, page(3..=4, 3));
    source.fail_once("popular:2", FetchError::status(503));
    let (catalog, source, view) = controller(source);
    catalog.init().await.unwrap();

    let err = catalog.load_more().await.unwrap_err();
    assert!(matches!(
        err,
        CatalogError::Fetch(FetchError::HttpStatus {
            status: 503,
            class: StatusClass::ServerError
        })
    ));
    assert_eq!(view.errors().len(), 1);
    let snap = catalog.snapshot();
    assert_eq!(snap.state.page, 1);
    assert!(!snap.busy);
    assert_eq!(ids(&catalog.movies()), vec![1, 2]);

    assert_eq!(
        catalog.load_more().await.unwrap(),
        LoadOutcome::Loaded { added: 2 }
    );
    assert_eq!(source.count("popular:2"), 2);
}

#[tokio::test]
async fn network_failure_on_switch_clears_busy() {
    let mut source = FakeSource::default();
    source.popular.insert(1, page(1..=2, 2));
    source.fail_once("popular:1", FetchError::Network("connection reset".into()));
    let (catalog, _source, view) = controller(source);

    assert!(catalog.init().await.is_err());
    assert!(!catalog.snapshot().busy);
    assert_eq!(
        view.errors(),
        vec![FetchError::Network("connection reset".into())]
    );
    assert_eq!(view.load_more_visible(), Some(false));

    catalog.switch_to_popular().await.unwrap();
    assert_eq!(ids(&catalog.movies()), vec![1, 2]);
    assert_eq!(view.load_more_visible(), Some(true));
}

#[tokio::test(start_paused = true)]
async fn timeout_hook_releases_a_hung_fetch() {
    let mut source = FakeSource::default();
    source.popular.insert(1, page(1..=2, 3));
    let _gate = source.hold("popular:2");
    let source = Arc::new(source);
    let view = Arc::new(RecordingView::default());
    let catalog = CatalogController::new(source.clone(), view.clone())
        .with_timeout(Some(Duration::from_secs(5)));
    catalog.init().await.unwrap();

    let err = catalog.load_more().await.unwrap_err();
    assert!(matches!(
        err,
        CatalogError::Fetch(FetchError::Timeout(d)) if d == Duration::from_secs(5)
    ));
    assert!(!catalog.snapshot().busy);
    assert_eq!(catalog.snapshot().state.page, 1);
}

#[tokio::test(start_paused = true)]
async fn sentinel_pages_through_without_duplicate_fetches() {
    let mut source = FakeSource::default();
    source.popular.insert(1, page(1..=2, 3));
    source.popular.insert(2, page(3..=4, 3));
    source.popular.insert(3, page(5..=6, 3));
    let (catalog, source, view) = controller(source);
    catalog.init().await.unwrap();

    let (_tx, rx) = watch::channel(Viewport {
        scroll_top: 0.0,
        viewport_height: 600.0,
        marker_top: 300.0,
    });
    let handle = ScrollSentinel::default().arm(catalog.clone(), rx);

    tokio::time::sleep(Duration::from_secs(5)).await;
    assert!(handle.is_armed());
    assert_eq!(catalog.snapshot().state.page, 3);
    assert_eq!(ids(&catalog.movies()), vec![1, 2, 3, 4, 5, 6]);
    assert_eq!(source.count("popular:2"), 1);
    assert_eq!(source.count("popular:3"), 1);
    assert_eq!(view.load_more_visible(), Some(false));
}
