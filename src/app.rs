use crate::feed::{ErrorKind, FeedClient, FeedItem, FetchRequest, FetchResult};
use crate::util::single_line;
use chrono::{DateTime, Local};
use std::borrow::Cow;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::{Duration, Instant};
use tokio_util::sync::CancellationToken;

/// How long a transient status message stays visible.
const STATUS_TTL: Duration = Duration::from_secs(3);

// ============================================================================
// Card View Model
// ============================================================================

/// Display-ready form of a [`FeedItem`].
///
/// Text is flattened to single lines so upstream newlines and control
/// characters never reach the terminal. A copyright that is blank after
/// flattening is treated as absent.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Card {
    pub title: String,
    pub copyright: Option<String>,
    pub image_url: String,
    pub summary: String,
}

impl From<&FeedItem> for Card {
    fn from(item: &FeedItem) -> Self {
        let title = single_line(&item.title);
        Self {
            title: if title.is_empty() {
                "Untitled".to_string()
            } else {
                title
            },
            copyright: item
                .copyright
                .as_deref()
                .map(single_line)
                .filter(|c| !c.is_empty()),
            image_url: single_line(&item.image_url),
            summary: single_line(&item.explanation),
        }
    }
}

// ============================================================================
// Feed View State
// ============================================================================

/// Error banner shown above the card list.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Banner {
    pub kind: ErrorKind,
    pub message: String,
}

/// Human-readable text for each failure kind.
pub fn failure_message(kind: ErrorKind) -> Cow<'static, str> {
    match kind {
        ErrorKind::InvalidRequest => {
            Cow::Borrowed("Invalid request: check the start date (YYYY-MM-DD) and API key")
        }
        ErrorKind::Network => Cow::Borrowed("Could not reach the server. Press r to retry."),
        ErrorKind::Auth => {
            Cow::Borrowed("API key rejected. Set APOD_API_KEY or api_key in config.toml.")
        }
        ErrorKind::ClientError(code) => {
            Cow::Owned(format!("The server refused the request (HTTP {code})."))
        }
        ErrorKind::DecodeMalformed => {
            Cow::Borrowed("The server sent a response we could not read.")
        }
    }
}

/// Everything the UI needs to draw the feed.
///
/// Only changed through [`FeedView::begin_loading`] and [`FeedView::apply`],
/// so rendering never depends on network timing. A failed refresh keeps the
/// cards from the last success.
#[derive(Debug, Default)]
pub struct FeedView {
    pub cards: Vec<Card>,
    pub banner: Option<Banner>,
    pub loading: bool,
    /// Malformed items dropped from the last successful page.
    pub skipped: usize,
    pub last_updated: Option<DateTime<Local>>,
}

impl FeedView {
    pub fn begin_loading(&mut self) {
        self.loading = true;
    }

    pub fn apply(&mut self, result: FetchResult) {
        self.loading = false;
        match result {
            FetchResult::Success(page) => {
                self.cards = page.items.iter().map(Card::from).collect();
                self.skipped = page.skipped;
                self.banner = None;
                self.last_updated = Some(Local::now());
            }
            FetchResult::Failure { kind, message } => {
                tracing::warn!(kind = ?kind, error = %message, "Feed refresh failed");
                self.banner = Some(Banner {
                    kind,
                    message: failure_message(kind).into_owned(),
                });
            }
        }
    }

    /// True when there is nothing to show and nothing on the way.
    pub fn is_empty_idle(&self) -> bool {
        self.cards.is_empty() && !self.loading
    }
}

// ============================================================================
// Application State
// ============================================================================

/// Events delivered from background tasks to the UI loop.
#[derive(Debug)]
pub enum AppEvent {
    FeedLoaded { generation: u64, result: FetchResult },
}

/// Central application state.
pub struct App {
    pub client: FeedClient,
    pub request: FetchRequest,
    pub feed: FeedView,
    pub selected: usize,
    pub needs_redraw: bool,
    pub status_message: Option<(String, Instant)>,
    pub spinner_frame: usize,

    /// Bumped for every refresh so late results from a superseded fetch are
    /// ignored.
    pub fetch_generation: u64,
    fetch_cancel: Option<CancellationToken>,
    fetch_handle: Option<JoinHandle<()>>,
}

impl App {
    pub fn new(client: FeedClient, request: FetchRequest) -> Self {
        Self {
            client,
            request,
            feed: FeedView::default(),
            selected: 0,
            needs_redraw: true,
            status_message: None,
            spinner_frame: 0,
            fetch_generation: 0,
            fetch_cancel: None,
            fetch_handle: None,
        }
    }

    /// Starts a background refresh, cancelling any refresh still running.
    ///
    /// The result arrives as [`AppEvent::FeedLoaded`] on `event_tx`.
    pub fn start_refresh(&mut self, event_tx: &mpsc::Sender<AppEvent>) {
        self.cancel_refresh();

        self.fetch_generation = self.fetch_generation.wrapping_add(1);
        let generation = self.fetch_generation;
        let cancel = CancellationToken::new();
        let tx = event_tx.clone();

        tracing::debug!(generation, date = self.request.date(), "Spawning feed refresh");

        self.feed.begin_loading();
        self.fetch_handle = Some(self.client.spawn_fetch(
            self.request.clone(),
            cancel.clone(),
            move |result| {
                if let Err(e) = tx.try_send(AppEvent::FeedLoaded { generation, result }) {
                    tracing::warn!(error = %e, "Failed to deliver feed result (receiver dropped)");
                }
            },
        ));
        self.fetch_cancel = Some(cancel);
    }

    /// Cancels an in-flight refresh. Its completion event is never sent.
    pub fn cancel_refresh(&mut self) {
        if let Some(cancel) = self.fetch_cancel.take() {
            cancel.cancel();
        }
        if let Some(handle) = self.fetch_handle.take() {
            handle.abort();
            tracing::debug!("Aborted previous feed refresh");
        }
        self.feed.loading = false;
    }

    pub fn handle_event(&mut self, event: AppEvent) {
        match event {
            AppEvent::FeedLoaded { generation, result } => {
                if generation != self.fetch_generation {
                    tracing::debug!(
                        generation,
                        current = self.fetch_generation,
                        "Ignoring stale feed result"
                    );
                    return;
                }
                self.fetch_cancel = None;
                self.fetch_handle = None;

                if let FetchResult::Success(page) = &result {
                    let msg = match page.skipped {
                        0 => format!("Loaded {} pictures", page.items.len()),
                        n => format!(
                            "Loaded {} pictures ({} unreadable skipped)",
                            page.items.len(),
                            n
                        ),
                    };
                    self.set_status(msg);
                }
                self.feed.apply(result);
                self.clamp_selection();
            }
        }
        self.needs_redraw = true;
    }

    pub fn selected_card(&self) -> Option<&Card> {
        self.feed.cards.get(self.selected)
    }

    pub fn nav_up(&mut self) {
        self.selected = self.selected.saturating_sub(1);
    }

    pub fn nav_down(&mut self) {
        if self.selected + 1 < self.feed.cards.len() {
            self.selected += 1;
        }
    }

    pub fn nav_first(&mut self) {
        self.selected = 0;
    }

    pub fn nav_last(&mut self) {
        self.selected = self.feed.cards.len().saturating_sub(1);
    }

    fn clamp_selection(&mut self) {
        if self.selected >= self.feed.cards.len() {
            self.selected = self.feed.cards.len().saturating_sub(1);
        }
    }

    pub fn set_status(&mut self, msg: impl Into<String>) {
        self.status_message = Some((msg.into(), Instant::now()));
        self.needs_redraw = true;
    }

    /// Drops the status message once it has expired. Returns true if cleared.
    pub fn clear_expired_status(&mut self) -> bool {
        match &self.status_message {
            Some((_, set_at)) if set_at.elapsed() >= STATUS_TTL => {
                self.status_message = None;
                true
            }
            _ => false,
        }
    }
}

/// Abort the in-flight refresh so no task outlives the UI loop.
impl Drop for App {
    fn drop(&mut self) {
        if let Some(cancel) = self.fetch_cancel.take() {
            cancel.cancel();
        }
        if let Some(handle) = self.fetch_handle.take() {
            handle.abort();
            tracing::debug!("Aborted feed refresh on App drop");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::feed::{FeedPage, HttpTransport, RetryPolicy};
    use pretty_assertions::assert_eq;
    use url::Url;
    use wiremock::matchers::method;
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn item(title: &str, copyright: Option<&str>) -> FeedItem {
        FeedItem {
            title: title.to_string(),
            explanation: format!("About\n{title}"),
            image_url: format!("https://apod.nasa.gov/{title}.jpg"),
            copyright: copyright.map(str::to_string),
        }
    }

    fn success(items: Vec<FeedItem>) -> FetchResult {
        FetchResult::Success(FeedPage {
            items,
            skipped: 0,
            attempts: 1,
        })
    }

    fn test_app(base: &str) -> App {
        let transport =
            HttpTransport::new(Url::parse(base).unwrap(), std::time::Duration::from_secs(5))
                .unwrap();
        let retry = RetryPolicy {
            max_attempts: 3,
            base_delay: std::time::Duration::from_millis(1),
        };
        App::new(
            FeedClient::new(transport, retry),
            FetchRequest::new("DEMO_KEY", "2023-09-08"),
        )
    }

    #[test]
    fn test_card_flattens_text() {
        let card = Card::from(&item("M31", Some("\nJane Doe\n")));
        assert_eq!(card.copyright.as_deref(), Some("Jane Doe"));
        assert_eq!(card.summary, "About M31");
    }

    #[test]
    fn test_card_blank_copyright_absent() {
        assert_eq!(Card::from(&item("A", Some(" \n "))).copyright, None);
        assert_eq!(Card::from(&item("A", None)).copyright, None);
    }

    #[test]
    fn test_card_empty_title_placeholder() {
        assert_eq!(Card::from(&item("", None)).title, "Untitled");
    }

    #[test]
    fn test_apply_success_replaces_cards() {
        let mut view = FeedView::default();
        view.begin_loading();
        view.apply(success(vec![item("A", None), item("B", Some("X"))]));

        assert!(!view.loading);
        assert!(view.banner.is_none());
        let titles: Vec<&str> = view.cards.iter().map(|c| c.title.as_str()).collect();
        assert_eq!(titles, vec!["A", "B"]);
        assert!(view.last_updated.is_some());
    }

    #[test]
    fn test_failure_keeps_previous_cards() {
        let mut view = FeedView::default();
        view.apply(success(vec![item("A", None)]));

        view.begin_loading();
        view.apply(FetchResult::failure(ErrorKind::Network, "retries exhausted"));

        assert_eq!(view.cards.len(), 1);
        assert_eq!(
            view.banner,
            Some(Banner {
                kind: ErrorKind::Network,
                message: failure_message(ErrorKind::Network).into_owned(),
            })
        );
        assert!(!view.loading);
    }

    #[test]
    fn test_success_clears_banner() {
        let mut view = FeedView::default();
        view.apply(FetchResult::failure(ErrorKind::Auth, "403"));
        assert!(view.banner.is_some());
        view.apply(success(Vec::new()));
        assert!(view.banner.is_none());
        assert!(view.cards.is_empty());
    }

    #[test]
    fn test_empty_idle_only_when_nothing_pending() {
        let mut view = FeedView::default();
        assert!(view.is_empty_idle());

        view.begin_loading();
        assert!(!view.is_empty_idle());

        view.apply(success(vec![item("A", None)]));
        assert!(!view.is_empty_idle());
    }

    #[test]
    fn test_failure_messages_distinct() {
        let kinds = [
            ErrorKind::InvalidRequest,
            ErrorKind::Network,
            ErrorKind::Auth,
            ErrorKind::ClientError(404),
            ErrorKind::DecodeMalformed,
        ];
        let messages: std::collections::HashSet<String> =
            kinds.iter().map(|k| failure_message(*k).into_owned()).collect();
        assert_eq!(messages.len(), kinds.len());
        assert!(failure_message(ErrorKind::ClientError(429)).contains("429"));
    }

    #[tokio::test]
    async fn test_stale_result_ignored() {
        let mut app = test_app("http://127.0.0.1:9/apod");
        app.fetch_generation = 2;
        app.handle_event(AppEvent::FeedLoaded {
            generation: 1,
            result: success(vec![item("Old", None)]),
        });
        assert!(app.feed.cards.is_empty());

        app.handle_event(AppEvent::FeedLoaded {
            generation: 2,
            result: success(vec![item("New", None)]),
        });
        assert_eq!(app.selected_card().map(|c| c.title.as_str()), Some("New"));
    }

    #[tokio::test]
    async fn test_selection_clamped_after_shrink() {
        let mut app = test_app("http://127.0.0.1:9/apod");
        app.handle_event(AppEvent::FeedLoaded {
            generation: 0,
            result: success(vec![item("A", None), item("B", None), item("C", None)]),
        });
        app.nav_last();
        assert_eq!(app.selected, 2);

        app.handle_event(AppEvent::FeedLoaded {
            generation: 0,
            result: success(vec![item("A", None)]),
        });
        assert_eq!(app.selected, 0);
    }

    #[tokio::test]
    async fn test_nav_bounds() {
        let mut app = test_app("http://127.0.0.1:9/apod");
        app.nav_up();
        app.nav_down();
        assert_eq!(app.selected, 0);
        assert!(app.selected_card().is_none());

        app.feed.apply(success(vec![item("A", None), item("B", None)]));
        app.nav_down();
        app.nav_down();
        assert_eq!(app.selected, 1);
        app.nav_first();
        assert_eq!(app.selected, 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_status_expires_after_3_seconds() {
        let mut app = test_app("http://127.0.0.1:9/apod");
        app.set_status("hello");
        assert!(!app.clear_expired_status());

        tokio::time::advance(Duration::from_secs(3)).await;
        assert!(app.clear_expired_status());
        assert!(app.status_message.is_none());
    }

    #[tokio::test]
    async fn test_refresh_delivers_event() {
        let mock_server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_string(
                r#"[{"title":"M31","explanation":"Andromeda","url":"https://apod.nasa.gov/m31.jpg","copyright":"Jane"}]"#,
            ))
            .mount(&mock_server)
            .await;

        let mut app = test_app(&format!("{}/apod", mock_server.uri()));
        let (tx, mut rx) = mpsc::channel(4);

        app.start_refresh(&tx);
        assert!(app.feed.loading);

        let event = rx.recv().await.unwrap();
        app.handle_event(event);

        assert!(!app.feed.loading);
        assert_eq!(app.feed.cards.len(), 1);
        assert_eq!(app.feed.cards[0].copyright.as_deref(), Some("Jane"));
        assert!(app.status_message.is_some());
    }

    #[tokio::test]
    async fn test_second_refresh_supersedes_first() {
        let mock_server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_string("[]")
                    .set_delay(std::time::Duration::from_millis(100)),
            )
            .mount(&mock_server)
            .await;

        let mut app = test_app(&format!("{}/apod", mock_server.uri()));
        let (tx, mut rx) = mpsc::channel(4);

        app.start_refresh(&tx);
        app.start_refresh(&tx);
        assert_eq!(app.fetch_generation, 2);

        let AppEvent::FeedLoaded { generation, .. } = rx.recv().await.unwrap();
        assert_eq!(generation, 2);
    }
}
