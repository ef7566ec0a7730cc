//! Terminal presentation: cards, detail panel, rating control and the
//! simulated viewport that feeds the scroll sentinel.

use crate::catalog::CatalogView;
use crate::error::FetchError;
use crate::models::{Movie, MovieDetail};
use crate::overlay::{DetailView, ListenerId, OverlayHost, RatingView};
use crate::sentinel::Viewport;
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::{Mutex, PoisonError};
use tokio::sync::watch;
use tracing::debug;

const CARD_POSTER_BASE: &str = "https://image.tmdb.org/t/p/w220_and_h330_face";
const DETAIL_POSTER_BASE: &str = "https://image.tmdb.org/t/p/w500";
const NO_IMAGE: &str = "(no image)";

pub const POPULAR_TITLE: &str = "지금 인기 있는 영화";
const ROW_HEIGHT: f64 = 60.0;
const VIEWPORT_HEIGHT: f64 = 600.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PosterSize {
    Card,
    Detail,
}

pub fn poster_url(path: Option<&str>, size: PosterSize) -> String {
    let base = match size {
        PosterSize::Card => CARD_POSTER_BASE,
        PosterSize::Detail => DETAIL_POSTER_BASE,
    };
    match path.filter(|p| !p.is_empty()) {
        Some(p) => format!("{base}{p}"),
        None => NO_IMAGE.to_string(),
    }
}

pub fn search_title(keyword: &str) -> String {
    format!("\"{keyword}\" 검색 결과")
}

pub fn star_bar(rating: &RatingView) -> String {
    rating
        .stars()
        .iter()
        .map(|filled| if *filled { '★' } else { '☆' })
        .collect()
}

pub fn format_card(movie: &Movie) -> String {
    format!(
        "[{:>7}] {}  ★ {:.2}  {}",
        movie.id,
        movie.title,
        movie.vote_average,
        poster_url(movie.poster_path.as_deref(), PosterSize::Card)
    )
}

pub fn format_error(error: &FetchError) -> String {
    match error.class() {
        Some(class) => format!("요청에 실패했습니다 ({}): {}", class.label(), error),
        None => format!("요청에 실패했습니다: {error}"),
    }
}

/// Writes to stdout. Tracks rendered rows so the viewport can be simulated.
#[derive(Debug)]
pub struct ConsoleView {
    rows: AtomicUsize,
    load_more_visible: AtomicBool,
    scroll_locked: AtomicBool,
    next_listener: AtomicU64,
    escape: Mutex<Option<ListenerId>>,
    viewport: watch::Sender<Viewport>,
}

impl Default for ConsoleView {
    fn default() -> Self {
        Self::new()
    }
}

impl ConsoleView {
    pub fn new() -> Self {
        let (viewport, _) = watch::channel(Viewport {
            scroll_top: 0.0,
            viewport_height: VIEWPORT_HEIGHT,
            marker_top: 0.0,
        });
        Self {
            rows: AtomicUsize::new(0),
            load_more_visible: AtomicBool::new(false),
            scroll_locked: AtomicBool::new(false),
            next_listener: AtomicU64::new(1),
            escape: Mutex::new(None),
            viewport,
        }
    }

    pub fn viewport(&self) -> watch::Receiver<Viewport> {
        self.viewport.subscribe()
    }

    pub fn print_title(&self, title: &str) {
        println!("\n== {title} ==");
    }

    /// Brings the trailing marker into view. Ignored while an overlay holds the scroll.
    pub fn scroll_to_bottom(&self) -> bool {
        if self.scroll_locked.load(Ordering::SeqCst) {
            return false;
        }
        self.viewport.send_modify(|v| {
            v.scroll_top = (v.marker_top - v.viewport_height).max(0.0);
        });
        true
    }

    pub fn escape_listener(&self) -> Option<ListenerId> {
        *self.escape.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn set_rows(&self, rows: usize) {
        self.rows.store(rows, Ordering::SeqCst);
        self.viewport.send_modify(|v| {
            v.marker_top = rows as f64 * ROW_HEIGHT;
            if rows == 0 {
                v.scroll_top = 0.0;
            }
        });
    }
}

impl CatalogView for ConsoleView {
    fn show_skeleton(&self) {
        println!("  ...");
    }

    fn hide_skeleton(&self) {}

    fn render_list(&self, movies: &[Movie]) {
        for movie in movies {
            println!("{}", format_card(movie));
        }
        self.set_rows(movies.len());
    }

    fn append_items(&self, movies: &[Movie]) {
        for movie in movies {
            println!("{}", format_card(movie));
        }
        self.set_rows(self.rows.load(Ordering::SeqCst) + movies.len());
    }

    fn set_load_more_visible(&self, visible: bool) {
        let was = self.load_more_visible.swap(visible, Ordering::SeqCst);
        if was != visible && !visible {
            println!("  (마지막 페이지입니다)");
        }
    }

    fn show_error(&self, error: &FetchError) {
        eprintln!("{}", format_error(error));
    }
}

impl DetailView for ConsoleView {
    fn render_detail(&self, detail: &MovieDetail) {
        println!("\n┌ {}", detail.title);
        println!(
            "│ {}  ★ {:.2}",
            detail.genre_names(),
            detail.vote_average
        );
        println!(
            "│ {}",
            poster_url(detail.poster_path.as_deref(), PosterSize::Detail)
        );
        println!("│ {}", detail.overview);
    }

    fn render_rating(&self, rating: &RatingView) {
        match rating.score {
            Some(score) => println!(
                "└ 내 별점 {} {} {}",
                star_bar(rating),
                score,
                rating.description().unwrap_or_default()
            ),
            None => println!("└ 내 별점 {}", star_bar(rating)),
        }
    }

    fn clear_detail(&self) {
        println!("(닫힘)");
    }

    fn show_error(&self, error: &FetchError) {
        eprintln!("{}", format_error(error));
    }
}

impl OverlayHost for ConsoleView {
    fn suspend_scroll(&self) {
        self.scroll_locked.store(true, Ordering::SeqCst);
    }

    fn resume_scroll(&self) {
        self.scroll_locked.store(false, Ordering::SeqCst);
    }

    fn attach_escape(&self, movie_id: i32) -> ListenerId {
        let id = ListenerId(self.next_listener.fetch_add(1, Ordering::SeqCst));
        *self.escape.lock().unwrap_or_else(PoisonError::into_inner) = Some(id);
        debug!(movie_id, listener = id.0, "Escape listener attached");
        id
    }

    fn detach_escape(&self, listener: ListenerId) {
        let mut escape = self.escape.lock().unwrap_or_else(PoisonError::into_inner);
        if *escape == Some(listener) {
            *escape = None;
        }
        debug!(listener = listener.0, "Escape listener detached");
    }
}
