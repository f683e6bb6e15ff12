use crate::app::App;
use ratatui::{
    layout::Rect,
    style::{Color, Style},
    widgets::Paragraph,
    Frame,
};
use std::borrow::Cow;

const SPINNER: [char; super::loop_runner::SPINNER_FRAMES] =
    ['⠋', '⠙', '⠹', '⠸', '⠼', '⠴', '⠦', '⠧', '⠇', '⠏'];

/// Render the status bar
pub fn render(f: &mut Frame, app: &App, area: Rect) {
    if area.width < 1 || area.height < 1 {
        return;
    }

    let text: Cow<'_, str> = if app.feed.loading {
        Cow::Owned(format!("{} Fetching pictures...", SPINNER[app.spinner_frame % SPINNER.len()]))
    } else if let Some((msg, _)) = &app.status_message {
        Cow::Borrowed(msg.as_str())
    } else {
        Cow::Borrowed("[j/k]move [g/G]first/last [r]efresh [q]uit")
    };

    let style = Style::default().bg(Color::DarkGray).fg(Color::White);
    f.render_widget(Paragraph::new(text).style(style), area);
}

/// Render the error banner, if any
pub fn render_banner(f: &mut Frame, app: &App, area: Rect) {
    let Some(banner) = &app.feed.banner else {
        return;
    };

    let text = if app.feed.cards.is_empty() {
        banner.message.clone()
    } else {
        format!("{} Showing previous results.", banner.message)
    };

    let style = Style::default().bg(Color::Red).fg(Color::White);
    f.render_widget(Paragraph::new(text).style(style), area);
}
