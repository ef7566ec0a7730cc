//! Movie detail overlay.
//!
//! At most one overlay exists at a time. [`OverlayRegistry`] owns it and
//! disposes the previous overlay before handing out one for another movie, so
//! the old overlay's escape subscription and scroll lock are always released
//! first.

use crate::error::{FetchError, OverlayError};
use crate::models::MovieDetail;
use crate::tmdb::MovieSource;
use crate::votes::{Score, VoteStore, STAR_COUNT};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ListenerId(pub u64);

/// Page-level effects an open overlay holds on to.
pub trait OverlayHost: Send + Sync {
    fn suspend_scroll(&self);
    fn resume_scroll(&self);
    fn attach_escape(&self, movie_id: i32) -> ListenerId;
    fn detach_escape(&self, listener: ListenerId);
}

pub trait DetailView: Send + Sync {
    fn render_detail(&self, detail: &MovieDetail);
    fn render_rating(&self, rating: &RatingView);
    fn clear_detail(&self);
    fn show_error(&self, error: &FetchError);
}

/// State of the five-star control.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RatingView {
    pub filled: usize,
    pub score: Option<Score>,
}

impl RatingView {
    pub fn empty() -> Self {
        Self {
            filled: 0,
            score: None,
        }
    }

    pub fn for_score(score: Score) -> Self {
        Self {
            filled: score.filled_stars(),
            score: Some(score),
        }
    }

    pub fn description(&self) -> Option<&'static str> {
        self.score.map(Score::description)
    }

    /// Fill state per position, left to right.
    pub fn stars(&self) -> [bool; STAR_COUNT] {
        let mut stars = [false; STAR_COUNT];
        for star in stars.iter_mut().take(self.filled) {
            *star = true;
        }
        stars
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OverlayEvent {
    Escape,
    BackdropClick,
    CloseButton,
    StarSelected(usize),
}

#[derive(Debug, Clone, PartialEq)]
pub struct OverlaySession {
    pub is_open: bool,
    pub movie_id: i32,
    pub detail: Option<MovieDetail>,
    pub current_score: Option<Score>,
}

/// Everything an overlay needs besides its movie id.
#[derive(Clone)]
pub struct OverlayContext {
    pub source: Arc<dyn MovieSource>,
    pub votes: VoteStore,
    pub view: Arc<dyn DetailView>,
    pub host: Arc<dyn OverlayHost>,
    pub timeout: Option<Duration>,
}

pub struct DetailOverlay {
    session: OverlaySession,
    escape: Option<ListenerId>,
    ctx: OverlayContext,
}

impl DetailOverlay {
    pub fn new(movie_id: i32, ctx: OverlayContext) -> Self {
        Self {
            session: OverlaySession {
                is_open: false,
                movie_id,
                detail: None,
                current_score: None,
            },
            escape: None,
            ctx,
        }
    }

    pub fn movie_id(&self) -> i32 {
        self.session.movie_id
    }

    pub fn session(&self) -> &OverlaySession {
        &self.session
    }

    pub fn is_open(&self) -> bool {
        self.session.is_open
    }

    pub async fn open(&mut self) -> Result<(), OverlayError> {
        if self.session.is_open {
            return Ok(());
        }
        let movie_id = self.session.movie_id;
        self.ctx.host.suspend_scroll();

        let detail = match self.fetch_detail().await {
            Ok(detail) => detail,
            Err(e) => {
                warn!("Failed to load detail for movie {}: {}", movie_id, e);
                self.ctx.host.resume_scroll();
                self.ctx.view.show_error(&e);
                return Err(e.into());
            }
        };

        self.ctx.view.render_detail(&detail);
        self.ctx.view.render_rating(&RatingView::empty());
        let stored = self.ctx.votes.get(movie_id);
        if let Some(score) = stored {
            self.ctx.view.render_rating(&RatingView::for_score(score));
        }
        if self.escape.is_none() {
            self.escape = Some(self.ctx.host.attach_escape(movie_id));
        }

        info!("Opened detail for '{}' ({})", detail.title, movie_id);
        self.session.detail = Some(detail);
        self.session.current_score = stored;
        self.session.is_open = true;
        Ok(())
    }

    pub fn close(&mut self) {
        if !self.session.is_open {
            return;
        }
        self.ctx.host.resume_scroll();
        if let Some(listener) = self.escape.take() {
            self.ctx.host.detach_escape(listener);
        }
        self.ctx.view.clear_detail();
        self.session.detail = None;
        self.session.current_score = None;
        self.session.is_open = false;
        info!("Closed detail for movie {}", self.session.movie_id);
    }

    /// Releases everything the overlay holds. Used before replacement.
    pub fn dispose(mut self) {
        self.close();
        debug!("Disposed overlay for movie {}", self.session.movie_id);
    }

    pub fn handle_event(&mut self, event: OverlayEvent) -> Result<(), OverlayError> {
        match event {
            OverlayEvent::Escape if self.escape.is_none() => Ok(()),
            OverlayEvent::Escape | OverlayEvent::BackdropClick | OverlayEvent::CloseButton => {
                self.close();
                Ok(())
            }
            OverlayEvent::StarSelected(index) => self.on_star_selected(index).map(|_| ()),
        }
    }

    pub fn on_star_selected(&mut self, index: usize) -> Result<Score, OverlayError> {
        let score = Score::from_star_index(index).ok_or(OverlayError::InvalidStar(index))?;
        if !self.session.is_open {
            return Err(OverlayError::NotOpen);
        }
        self.ctx.votes.set(self.session.movie_id, score)?;
        self.ctx.view.render_rating(&RatingView::for_score(score));
        self.session.current_score = Some(score);
        Ok(score)
    }

    async fn fetch_detail(&self) -> Result<MovieDetail, FetchError> {
        let request = self.ctx.source.fetch_movie_detail(self.session.movie_id);
        match self.ctx.timeout {
            Some(limit) => tokio::time::timeout(limit, request)
                .await
                .map_err(|_| FetchError::Timeout(limit))?,
            None => request.await,
        }
    }
}

/// Owner of the single live overlay.
pub struct OverlayRegistry {
    ctx: OverlayContext,
    current: Option<DetailOverlay>,
}

impl OverlayRegistry {
    pub fn new(ctx: OverlayContext) -> Self {
        Self { ctx, current: None }
    }

    /// Overlay for `movie_id`, reusing the live one when it matches and
    /// disposing it first when it does not.
    pub fn get_instance(&mut self, movie_id: i32) -> &mut DetailOverlay {
        if self
            .current
            .as_ref()
            .is_some_and(|overlay| overlay.movie_id() != movie_id)
        {
            if let Some(previous) = self.current.take() {
                previous.dispose();
            }
        }
        let ctx = &self.ctx;
        self.current
            .get_or_insert_with(|| DetailOverlay::new(movie_id, ctx.clone()))
    }

    /// Card selection entry point. Ids below 1 never come from the catalog.
    pub async fn open_movie(&mut self, movie_id: i32) -> Result<&mut DetailOverlay, OverlayError> {
        if movie_id <= 0 {
            return Err(OverlayError::InvalidMovie(movie_id));
        }
        let overlay = self.get_instance(movie_id);
        overlay.open().await?;
        Ok(overlay)
    }

    pub fn current(&mut self) -> Option<&mut DetailOverlay> {
        self.current.as_mut()
    }

    pub fn close_current(&mut self) {
        if let Some(overlay) = self.current.as_mut() {
            overlay.close();
        }
    }
}
