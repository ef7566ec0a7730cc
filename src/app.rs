use crate::catalog::{CatalogController, LoadOutcome};
use crate::config::Config;
use crate::error::{CatalogError, OverlayError};
use crate::overlay::{OverlayContext, OverlayEvent, OverlayRegistry};
use crate::render::{search_title, ConsoleView, POPULAR_TITLE};
use crate::sentinel::{ScrollSentinel, SentinelHandle};
use crate::tmdb::{MovieSource, TmdbClient};
use crate::votes::{FileStorage, RecordStorage, VoteStore};
use anyhow::Result;
use std::future::Future;
use std::sync::Arc;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, BufReader};
use tracing::{debug, info, warn};

const EMPTY_KEYWORD: &str = "검색어를 입력해 주세요.";

const HELP: &str = "\
commands:
  popular            show the popular feed
  search <keyword>   search movies
  more               load the next page
  scroll             scroll to the end of the list
  open <id>          open movie detail
  star <1-5>         rate the open movie
  close | esc        close the detail
  votes              list saved ratings
  quit";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Popular,
    Search(String),
    More,
    Scroll,
    Open(i32),
    Star(usize),
    Close,
    Escape,
    Votes,
    Help,
    Quit,
}

impl Command {
    pub fn parse(line: &str) -> Option<Self> {
        let line = line.trim();
        let (head, rest) = match line.split_once(char::is_whitespace) {
            Some((head, rest)) => (head, rest.trim()),
            None => (line, ""),
        };
        let command = match head.to_lowercase().as_str() {
            "popular" | "home" => Command::Popular,
            "search" | "s" => Command::Search(rest.to_string()),
            "more" | "m" => Command::More,
            "scroll" => Command::Scroll,
            "open" | "o" => Command::Open(rest.parse().ok()?),
            "star" => {
                let stars: usize = rest.parse().ok()?;
                Command::Star(stars.checked_sub(1)?)
            }
            "close" | "backdrop" => Command::Close,
            "esc" => Command::Escape,
            "votes" => Command::Votes,
            "help" | "?" => Command::Help,
            "quit" | "exit" | "q" => Command::Quit,
            _ => return None,
        };
        Some(command)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Flow {
    Continue,
    Quit,
}

/// Composition root: catalog, sentinel, overlay registry and the terminal view.
pub struct MovieApp {
    catalog: Arc<CatalogController>,
    overlays: OverlayRegistry,
    view: Arc<ConsoleView>,
    votes: VoteStore,
    sentinel: ScrollSentinel,
    sentinel_handle: Option<SentinelHandle>,
}

impl MovieApp {
    pub fn new(
        config: &Config,
        source: Arc<dyn MovieSource>,
        storage: Arc<dyn RecordStorage>,
    ) -> Self {
        let view = Arc::new(ConsoleView::new());
        let votes = VoteStore::new(storage);
        let catalog = Arc::new(
            CatalogController::new(source.clone(), view.clone())
                .with_timeout(config.request_timeout),
        );
        let overlays = OverlayRegistry::new(OverlayContext {
            source,
            votes: votes.clone(),
            view: view.clone(),
            host: view.clone(),
            timeout: config.request_timeout,
        });
        Self {
            catalog,
            overlays,
            view,
            votes,
            sentinel: ScrollSentinel::new(config.scroll_margin, config.settle_delay),
            sentinel_handle: None,
        }
    }

    pub fn from_config(config: &Config) -> Result<Self> {
        let source: Arc<dyn MovieSource> =
            Arc::new(TmdbClient::new(&config.tmdb_token, &config.language)?);
        let storage = FileStorage::new(&config.data_dir);
        info!("Votes stored under {}", storage.dir().display());
        Ok(Self::new(config, source, Arc::new(storage)))
    }

    pub fn catalog(&self) -> &Arc<CatalogController> {
        &self.catalog
    }

    /// Loads the first page and arms the scroll sentinel.
    pub async fn start(&mut self) {
        self.view.print_title(POPULAR_TITLE);
        if let Err(e) = self.catalog.init().await {
            warn!("Initial catalog load failed: {}", e);
        }
        self.rearm_sentinel();
    }

    fn rearm_sentinel(&mut self) {
        if self.sentinel_handle.as_ref().is_some_and(SentinelHandle::is_armed) {
            return;
        }
        let handle = self.sentinel.arm(self.catalog.clone(), self.view.viewport());
        self.sentinel_handle = Some(handle);
    }

    pub async fn execute(&mut self, command: Command) -> Flow {
        match command {
            Command::Popular => {
                self.view.print_title(POPULAR_TITLE);
                report_catalog(self.catalog.switch_to_popular().await.map(|_| ()));
            }
            Command::Search(keyword) => {
                let keyword = keyword.trim();
                if keyword.is_empty() {
                    println!("{EMPTY_KEYWORD}");
                    return Flow::Continue;
                }
                self.view.print_title(&search_title(keyword));
                report_catalog(self.catalog.switch_to_search(keyword).await.map(|_| ()));
            }
            Command::More => match self.catalog.load_more().await {
                Ok(LoadOutcome::Exhausted) | Ok(LoadOutcome::EndReached) => {
                    println!("더 불러올 영화가 없습니다.")
                }
                Ok(outcome) => debug!(?outcome, "Load more finished"),
                Err(e) => report_catalog(Err(e)),
            },
            Command::Scroll => {
                if !self.view.scroll_to_bottom() {
                    debug!("Scroll ignored while detail is open");
                }
            }
            Command::Open(movie_id) => {
                if let Err(e) = self.overlays.open_movie(movie_id).await {
                    report_overlay(e);
                }
            }
            Command::Star(index) => match self.overlays.current() {
                Some(overlay) => {
                    if let Err(e) = overlay.handle_event(OverlayEvent::StarSelected(index)) {
                        report_overlay(e);
                    }
                }
                None => report_overlay(OverlayError::NotOpen),
            },
            Command::Close => self.overlays.close_current(),
            Command::Escape => {
                if let Some(overlay) = self.overlays.current() {
                    if let Err(e) = overlay.handle_event(OverlayEvent::Escape) {
                        report_overlay(e);
                    }
                }
            }
            Command::Votes => {
                for (movie_id, score) in self.votes.all() {
                    println!("{movie_id}: {score}");
                }
            }
            Command::Help => println!("{HELP}"),
            Command::Quit => return Flow::Quit,
        }
        Flow::Continue
    }

    pub fn shutdown(&mut self) {
        self.overlays.close_current();
        if let Some(handle) = self.sentinel_handle.take() {
            handle.disarm();
        }
    }
}

fn report_catalog(result: Result<(), CatalogError>) {
    match result {
        Ok(()) => {}
        Err(CatalogError::InvalidInput) => println!("{EMPTY_KEYWORD}"),
        Err(CatalogError::Busy) => println!("불러오는 중입니다. 잠시 후 다시 시도해 주세요."),
        // Already shown by the view.
        Err(CatalogError::Fetch(e)) => debug!("Catalog fetch failed: {}", e),
    }
}

fn report_overlay(error: OverlayError) {
    match error {
        OverlayError::Fetch(e) => debug!("Detail fetch failed: {}", e),
        other => println!("{other}"),
    }
}

pub async fn run() -> Result<()> {
    let config = Config::from_env()?;
    let mut app = MovieApp::from_config(&config)?;
    app.start().await;
    println!("{HELP}");

    drive(&mut app, BufReader::new(tokio::io::stdin()), shutdown_signal()).await?;

    app.shutdown();
    info!("Bye");
    Ok(())
}

/// Feeds input lines to `app` until quit, end of input or `shutdown`.
/// A running command is abandoned when `shutdown` fires.
pub async fn drive<R, S>(app: &mut MovieApp, input: R, shutdown: S) -> Result<()>
where
    R: AsyncBufRead + Unpin,
    S: Future<Output = ()>,
{
    let mut lines = input.lines();
    tokio::pin!(shutdown);
    loop {
        let line = tokio::select! {
            line = lines.next_line() => line?,
            _ = &mut shutdown => break,
        };
        let Some(line) = line else { break };
        if line.trim().is_empty() {
            continue;
        }
        let Some(command) = Command::parse(&line) else {
            println!("{HELP}");
            continue;
        };
        tokio::select! {
            flow = app.execute(command) => {
                if flow == Flow::Quit {
                    break;
                }
            }
            _ = &mut shutdown => {
                warn!("Shutdown requested while a command was running");
                break;
            }
        }
    }
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!("Failed to listen for Ctrl+C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{signal, SignalKind};
        match signal(SignalKind::terminate()) {
            Ok(mut term) => {
                term.recv().await;
            }
            Err(e) => {
                warn!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Shutdown signal received (Ctrl+C)");
        }
        _ = terminate => {
            info!("Shutdown signal received (SIGTERM)");
        }
    }
}
