//! Terminal UI rendering.
//!
//! All drawing logic lives here, separated from application state ([`App`])
//! and input handling ([`crate::input`]).  Every frame is built from a
//! [`DashboardView`], so nothing here looks at the scheduler directly.
//!
//! ## Layout
//!
//! ```text
//! ┌ ticker strip ────────────────────────────────────────────┐
//! │ header: status label · source · key state                │
//! │ error banner (only when the last fetch failed)           │
//! │ trend list                          │ summary / sources  │
//! │ countdown gauge                                          │
//! │ status bar / key help                                    │
//! └──────────────────────────────────────────────────────────┘
//! ```

use ratatui::{
    layout::{Constraint, Layout, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Gauge, List, ListItem, ListState, Paragraph, Wrap},
    Frame,
};

use crate::app::App;
use crate::source::{Sentiment, TrendItem};
use crate::view::{DashboardView, StatusLabel};

const ACCENT: Color = Color::Rgb(249, 115, 22);
const HEAT_CELLS: usize = 10;

/// Draw the complete UI for one frame.
pub fn draw(app: &mut App, frame: &mut Frame) {
    // The view borrows the app; selection state is copied out and written
    // back once the list has been rendered.
    let mut list_state = app.list_state.clone();
    {
        let view = app.view();
        let error_height = u16::from(view.error.is_some());

        let [ticker_area, header_area, error_area, main_area, gauge_area, status_area] =
            Layout::vertical([
                Constraint::Length(1),
                Constraint::Length(1),
                Constraint::Length(error_height),
                Constraint::Min(3),
                Constraint::Length(1),
                Constraint::Length(1),
            ])
            .areas(frame.area());

        draw_ticker(app, &view, frame, ticker_area);
        draw_header(app, &view, frame, header_area);
        if let Some(err) = &view.error {
            frame.render_widget(
                Paragraph::new(Span::styled(
                    format!(" {err}"),
                    Style::default().fg(Color::Red).add_modifier(Modifier::BOLD),
                )),
                error_area,
            );
        }

        let [list_area, side_area] =
            Layout::horizontal([Constraint::Percentage(65), Constraint::Percentage(35)])
                .areas(main_area);
        draw_trend_list(&view, frame, list_area, &mut list_state);
        draw_side_panel(&view, frame, side_area);
        draw_countdown(&view, frame, gauge_area);
        draw_status_bar(app, frame, status_area);
    }
    app.list_state = list_state;
}

fn heat_bar(score: u8) -> String {
    let filled = (usize::from(score) * HEAT_CELLS).div_ceil(100).min(HEAT_CELLS);
    format!("{}{}", "█".repeat(filled), "░".repeat(HEAT_CELLS - filled))
}

fn sentiment_color(sentiment: Sentiment) -> Color {
    match sentiment {
        Sentiment::Positive => Color::Green,
        Sentiment::Negative => Color::Red,
        Sentiment::Neutral => Color::Gray,
        Sentiment::Viral => Color::Magenta,
    }
}

/// Category badge colour, keyed on words in the free-form category.
fn category_color(category: &str) -> Color {
    let upper = category.to_uppercase();
    if upper.contains("BREAKING") {
        Color::Red
    } else if upper.contains("VIRAL") || upper.contains("MEME") {
        Color::Magenta
    } else if upper.contains("TECH") {
        Color::Cyan
    } else if upper.contains("HOT") {
        Color::Yellow
    } else {
        Color::DarkGray
    }
}

/// Render the scrolling ticker of topics and heats.
fn draw_ticker(app: &App, view: &DashboardView<'_>, frame: &mut Frame, area: Rect) {
    let style = Style::default().bg(ACCENT).fg(Color::Black).add_modifier(Modifier::BOLD);

    let line = if view.items.is_empty() {
        let key_state = if app.has_key() { "READY" } else { "KEY REQUIRED" };
        Line::from(Span::styled(
            format!(" STATUS: {key_state} · AWAITING UPLINK..."),
            style,
        ))
    } else {
        let len = view.items.len();
        let start = app.ticker_offset % len;
        let spans: Vec<Span> = view
            .items
            .iter()
            .cycle()
            .skip(start)
            .take(len)
            .flat_map(|item| {
                [
                    Span::styled(format!("  ● {} ", item.topic), style),
                    Span::styled(
                        format!("▲ {}%", item.volume_score),
                        Style::default().bg(ACCENT).fg(Color::White),
                    ),
                ]
            })
            .collect();
        Line::from(spans)
    };

    frame.render_widget(Paragraph::new(line).style(Style::default().bg(ACCENT)), area);
}

/// Render the title line with the headline status.
fn draw_header(app: &App, view: &DashboardView<'_>, frame: &mut Frame, area: Rect) {
    let dot_color = match view.status {
        StatusLabel::Live | StatusLabel::Manual | StatusLabel::Syncing => ACCENT,
        StatusLabel::Cooldown(_) => Color::Yellow,
        StatusLabel::Offline if app.has_key() => Color::Green,
        StatusLabel::Offline | StatusLabel::KeyRequired => Color::Red,
    };

    let header = Paragraph::new(Line::from(vec![
        Span::styled(" ● ", Style::default().fg(dot_color)),
        Span::styled("TREND", Style::default().add_modifier(Modifier::BOLD)),
        Span::styled(
            "PULSE",
            Style::default().fg(ACCENT).add_modifier(Modifier::BOLD),
        ),
        Span::raw("  "),
        Span::styled(
            format!("[{}]", view.status),
            Style::default().fg(Color::Yellow).add_modifier(Modifier::BOLD),
        ),
        Span::raw("  "),
        Span::styled(app.source_name().to_string(), Style::default().fg(Color::Cyan)),
    ]));
    frame.render_widget(header, area);
}

fn trend_list_item<'a>(item: &'a TrendItem) -> ListItem<'a> {
    let topic_style = if item.is_hot() {
        Style::default().fg(ACCENT).add_modifier(Modifier::BOLD)
    } else {
        Style::default().fg(Color::White).add_modifier(Modifier::BOLD)
    };

    let mut headline = vec![
        Span::styled(
            format!("{} {:>3}% ", heat_bar(item.volume_score), item.volume_score),
            Style::default().fg(if item.is_hot() { Color::Red } else { Color::Blue }),
        ),
        Span::styled(item.topic.as_str(), topic_style),
        Span::raw("  "),
        Span::styled(
            format!("[{}]", item.category),
            Style::default().fg(category_color(&item.category)),
        ),
        Span::raw(" "),
        Span::styled(
            item.sentiment.as_str(),
            Style::default().fg(sentiment_color(item.sentiment)),
        ),
    ];
    if let Some(location) = &item.location {
        headline.push(Span::styled(
            format!("  @{location}"),
            Style::default().fg(Color::DarkGray),
        ));
    }

    ListItem::new(vec![
        Line::from(headline),
        Line::from(Span::styled(
            format!("  {}", item.description),
            Style::default().fg(Color::Gray),
        )),
    ])
}

/// Render the scrollable trend list.
fn draw_trend_list(
    view: &DashboardView<'_>,
    frame: &mut Frame,
    area: Rect,
    list_state: &mut ListState,
) {
    let title = format!(" Trends ({}) ", view.items.len());
    let block = Block::default().title(title).borders(Borders::ALL);

    if view.items.is_empty() {
        let hint = match view.status {
            StatusLabel::Syncing => "Scanning the feeds...",
            _ => "Press a to activate the system.",
        };
        frame.render_widget(
            Paragraph::new(Span::styled(hint, Style::default().fg(Color::DarkGray))).block(block),
            area,
        );
        return;
    }

    let items: Vec<ListItem> = view.items.iter().map(|item| trend_list_item(item)).collect();
    let list = List::new(items)
        .block(block)
        .highlight_style(
            Style::default()
                .add_modifier(Modifier::BOLD)
                .bg(Color::DarkGray),
        )
        .highlight_symbol("▸ ");

    frame.render_stateful_widget(list, area, list_state);
}

/// Render the global summary and grounding sources.
fn draw_side_panel(view: &DashboardView<'_>, frame: &mut Frame, area: Rect) {
    let [summary_area, sources_area] =
        Layout::vertical([Constraint::Percentage(40), Constraint::Percentage(60)]).areas(area);

    let summary = Paragraph::new(view.summary.unwrap_or("No outlook yet."))
        .style(Style::default().add_modifier(Modifier::ITALIC))
        .wrap(Wrap { trim: true })
        .block(Block::default().title(" Outlook ").borders(Borders::ALL));
    frame.render_widget(summary, summary_area);

    let sources: Vec<ListItem> = view
        .sources
        .iter()
        .map(|s| {
            ListItem::new(vec![
                Line::from(Span::styled(s.title.as_str(), Style::default().fg(Color::White))),
                Line::from(Span::styled(s.uri.as_str(), Style::default().fg(Color::DarkGray))),
            ])
        })
        .collect();
    let sources = List::new(sources).block(
        Block::default()
            .title(" Sources (Google Search) ")
            .borders(Borders::ALL),
    );
    frame.render_widget(sources, sources_area);
}

/// Render the next-refresh gauge and last-update clock.
fn draw_countdown(view: &DashboardView<'_>, frame: &mut Frame, area: Rect) {
    let label = format!(
        "Next refresh {}  ·  Last uplink {}",
        view.countdown, view.last_updated
    );
    let gauge = Gauge::default()
        .gauge_style(Style::default().fg(ACCENT).bg(Color::Black))
        .ratio(view.progress)
        .label(label);
    frame.render_widget(gauge, area);
}

/// Render the bottom status bar.
fn draw_status_bar(app: &App, frame: &mut Frame, area: Rect) {
    let status = Paragraph::new(Line::from(vec![
        Span::raw(" "),
        Span::styled(app.status.as_str(), Style::default().fg(Color::Yellow)),
        Span::raw("  "),
        Span::styled(
            format!("{} items", app.item_count()),
            Style::default().fg(Color::Green),
        ),
        Span::raw("  a: activate  s: stop  l: live  r: refresh  e: export  K: keywords  c: key  q: quit"),
    ]));
    frame.render_widget(status, area);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::app::tests::{app_with, sample_batch, settle};
    use crate::source::FetchError;
    use ratatui::backend::TestBackend;
    use ratatui::Terminal;

    fn render(app: &mut App) -> String {
        let backend = TestBackend::new(120, 30);
        let mut terminal = Terminal::new(backend).unwrap();
        terminal.draw(|f| draw(app, f)).unwrap();
        terminal
            .backend()
            .buffer()
            .content()
            .iter()
            .map(|c| c.symbol().chars().next().unwrap_or(' '))
            .collect()
    }

    #[test]
    fn heat_bar_scales_to_ten_cells() {
        assert_eq!(heat_bar(0), "░░░░░░░░░░");
        assert_eq!(heat_bar(55), "██████░░░░");
        assert_eq!(heat_bar(100), "██████████");
    }

    #[test]
    fn category_colors_by_keyword() {
        assert_eq!(category_color("Breaking Catalyst"), Color::Red);
        assert_eq!(category_color("Viral Meme"), Color::Magenta);
        assert_eq!(category_color("Tech Alpha"), Color::Cyan);
        assert_eq!(category_color("Sports"), Color::DarkGray);
    }

    #[test]
    fn draw_does_not_panic_with_no_items() {
        let mut app = app_with(Ok(sample_batch()));
        let text = render(&mut app);
        assert!(text.contains("OFFLINE"));
        assert!(text.contains("PAUSED"));
    }

    #[test]
    fn draw_shows_items_and_summary() {
        let mut app = app_with(Ok(sample_batch()));
        app.activate();
        settle(&mut app);
        app.select_first();

        let text = render(&mut app);
        assert!(text.contains("Hot"));
        assert!(text.contains("3 items"), "status bar should show item count");
        assert!(text.contains("MANUAL"));
        assert_eq!(app.list_state.selected(), Some(0));
    }

    #[test]
    fn draw_shows_error_banner() {
        let mut app = app_with(Err(FetchError::transient("timeout")));
        app.activate();
        settle(&mut app);

        let text = render(&mut app);
        assert!(text.contains("Signal lost"));
    }

    #[test]
    fn draw_shows_cooldown() {
        let mut app = app_with(Err(FetchError::QuotaExceeded("429".into())));
        app.activate();
        settle(&mut app);

        let text = render(&mut app);
        assert!(text.contains("COOLDOWN 2s"));
    }
}
