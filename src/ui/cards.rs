use crate::app::{App, Card};
use crate::util::truncate_to_width;
use ratatui::{
    layout::Rect,
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, List, ListItem, ListState},
    Frame,
};

/// Columns lost to the list border and highlight symbol.
const CHROME_WIDTH: u16 = 4;

/// Lines of one card: title, copyright (if any), image URL, summary.
fn card_lines(card: &Card, width: usize) -> Vec<Line<'static>> {
    let mut lines = Vec::with_capacity(5);

    lines.push(Line::from(Span::styled(
        truncate_to_width(&card.title, width).into_owned(),
        Style::default().add_modifier(Modifier::BOLD),
    )));

    if let Some(copyright) = &card.copyright {
        let text = format!("© {copyright}");
        lines.push(Line::from(Span::styled(
            truncate_to_width(&text, width).into_owned(),
            Style::default().fg(Color::Yellow),
        )));
    }

    lines.push(Line::from(Span::styled(
        truncate_to_width(&card.image_url, width).into_owned(),
        Style::default()
            .fg(Color::Cyan)
            .add_modifier(Modifier::UNDERLINED),
    )));

    if !card.summary.is_empty() {
        lines.push(Line::from(Span::styled(
            truncate_to_width(&card.summary, width).into_owned(),
            Style::default().fg(Color::Gray),
        )));
    }

    // Spacer between cards
    lines.push(Line::default());
    lines
}

/// Render the card list panel
pub fn render(f: &mut Frame, app: &App, area: Rect) {
    let width = area.width.saturating_sub(CHROME_WIDTH) as usize;

    let items: Vec<ListItem> = if app.feed.is_empty_idle() {
        let placeholder = if app.feed.banner.is_some() {
            "Nothing to show yet"
        } else {
            "No pictures for this date range"
        };
        vec![ListItem::new(placeholder)]
    } else if app.feed.cards.is_empty() {
        vec![ListItem::new("Loading pictures...")]
    } else {
        app.feed
            .cards
            .iter()
            .map(|card| ListItem::new(card_lines(card, width)))
            .collect()
    };

    let title = format!("Astronomy Picture of the Day - from {}", app.request.date());

    let list = List::new(items)
        .block(
            Block::default()
                .borders(Borders::ALL)
                .border_style(Style::default().fg(Color::Cyan))
                .title(title),
        )
        .highlight_style(Style::default().bg(Color::DarkGray))
        .highlight_symbol("▌ ");

    let mut state = ListState::default();
    if !app.feed.cards.is_empty() {
        state.select(Some(app.selected));
    }
    f.render_stateful_widget(list, area, &mut state);
}
