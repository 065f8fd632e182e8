use crate::state::App;
use crate::theme;
use clawpulse_core::MetricSample;
use ratatui::{
    layout::{Constraint, Direction, Layout, Rect},
    style::{Modifier, Style},
    symbols,
    text::{Line, Span, Text},
    widgets::{
        Axis, Block, Borders, Chart, Clear, Dataset, Gauge, GraphType, List, ListItem, Paragraph,
        Wrap,
    },
    Frame,
};

pub fn render(frame: &mut Frame, app: &App) {
    let size = frame.size();
    let rows = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(3),
            Constraint::Length(3),
            Constraint::Min(0),
        ])
        .split(size);
    frame.render_widget(render_header(app), rows[0]);
    frame.render_widget(render_memory_gauge(app), rows[1]);

    let body = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([Constraint::Percentage(55), Constraint::Percentage(45)])
        .split(rows[2]);
    render_activity(frame, app, body[0]);

    let side = Layout::default()
        .direction(Direction::Vertical)
        .constraints([Constraint::Percentage(40), Constraint::Percentage(60)])
        .split(body[1]);
    frame.render_widget(render_locks(app), side[0]);
    render_metrics_chart(frame, app, side[1]);

    if app.help_open {
        render_help_overlay(frame);
    }
}

fn panel(title: &str) -> Block<'_> {
    Block::default()
        .borders(Borders::ALL)
        .border_style(Style::default().fg(theme::BORDER))
        .style(Style::default().bg(theme::SURFACE))
        .title(Span::styled(title, theme::TITLE_STYLE))
}

fn render_header(app: &App) -> Paragraph<'static> {
    let projection = &app.projection;
    let state = projection.connection_status();
    let sub_agents = projection
        .sub_agent_count()
        .map(|count| count.to_string())
        .unwrap_or_else(|| "-".to_string());
    let mut spans = vec![
        Span::styled("● ", Style::default().fg(theme::connection_color(state))),
        Span::styled(
            theme::connection_label(state),
            Style::default()
                .fg(theme::connection_color(state))
                .add_modifier(Modifier::BOLD),
        ),
        Span::styled(
            format!("  {}", app.endpoint),
            Style::default().fg(theme::MUTED),
        ),
        Span::styled(
            format!("  Uptime: {}", projection.format_uptime()),
            Style::default().fg(theme::TEXT),
        ),
        Span::styled(
            format!("  Sub-agents: {sub_agents}"),
            Style::default().fg(theme::TEXT),
        ),
    ];
    if app.dropped_frames() > 0 {
        spans.push(Span::styled(
            format!("  Dropped: {}", app.dropped_frames()),
            Style::default().fg(theme::WARN),
        ));
    }
    Paragraph::new(Line::from(spans))
        .style(Style::default().bg(theme::BG))
        .block(
            Block::default()
                .borders(Borders::ALL)
                .border_style(Style::default().fg(theme::BORDER))
                .style(Style::default().bg(theme::BG))
                .title(Span::styled("Gateway", theme::TITLE_STYLE)),
        )
}

fn render_memory_gauge(app: &App) -> Gauge<'static> {
    let projection = &app.projection;
    let pct = projection.memory_pct().unwrap_or(0);
    let ratio = (pct as f64 / 100.0).clamp(0.0, 1.0);
    let color = theme::pressure_color(projection.memory_pressure());
    let label = match projection.memory_pct() {
        Some(pct) => format!("{pct}%"),
        None => "--".to_string(),
    };
    Gauge::default()
        .block(
            Block::default()
                .borders(Borders::ALL)
                .border_style(Style::default().fg(theme::BORDER))
                .style(Style::default().bg(theme::SURFACE))
                .title(Span::styled("Context Memory", theme::TITLE_STYLE)),
        )
        .gauge_style(Style::default().fg(color).bg(theme::BG))
        .ratio(ratio)
        .label(label)
}

fn render_activity(frame: &mut Frame, app: &App, area: Rect) {
    let visible = area.height.saturating_sub(2) as usize;
    let entries: Vec<_> = app.projection.activity_log().rev().take(visible).collect();
    let items: Vec<ListItem> = if entries.is_empty() {
        vec![ListItem::new(Span::styled(
            "waiting for gateway activity...",
            Style::default()
                .fg(theme::MUTED)
                .add_modifier(Modifier::ITALIC),
        ))]
    } else {
        entries
            .into_iter()
            .rev()
            .map(|entry| {
                let color = theme::severity_color(entry.severity);
                ListItem::new(Line::from(vec![
                    Span::styled(
                        format!("[{}] ", entry.timestamp.format("%H:%M:%S")),
                        Style::default().fg(theme::MUTED),
                    ),
                    Span::styled(format!("{} ", entry.icon), Style::default().fg(color)),
                    Span::styled(entry.message.clone(), Style::default().fg(color)),
                ]))
            })
            .collect()
    };
    frame.render_widget(List::new(items).block(panel("Activity")), area);
}

fn render_locks(app: &App) -> Paragraph<'static> {
    let board = app.projection.locks();
    let lines: Vec<Line> = if board.is_empty() {
        vec![Line::from(Span::styled(
            "no active locks",
            Style::default()
                .fg(theme::MUTED)
                .add_modifier(Modifier::ITALIC),
        ))]
    } else {
        board
            .entries()
            .iter()
            .map(|entry| {
                let color = theme::lock_color(entry.status);
                Line::from(vec![
                    Span::styled("▌", Style::default().fg(color)),
                    Span::styled(
                        entry.resource.clone(),
                        Style::default()
                            .fg(theme::TITLE)
                            .add_modifier(Modifier::BOLD),
                    ),
                    Span::styled(
                        format!("  owner: {}", entry.owner),
                        Style::default().fg(theme::MUTED),
                    ),
                    Span::styled(format!("  {}", entry.status), Style::default().fg(color)),
                ])
            })
            .collect()
    };
    let title = format!("Locks ({} held)", board.locked_count());
    Paragraph::new(Text::from(lines))
        .wrap(Wrap { trim: true })
        .block(
            Block::default()
                .borders(Borders::ALL)
                .border_style(Style::default().fg(theme::BORDER))
                .style(Style::default().bg(theme::SURFACE))
                .title(Span::styled(title, theme::TITLE_STYLE)),
        )
}

fn render_metrics_chart(frame: &mut Frame, app: &App, area: Rect) {
    let samples: Vec<&MetricSample> = app.projection.metric_history().collect();
    let cpu = series(&samples, |sample| sample.cpu_pct);
    let memory = series(&samples, |sample| sample.memory_pct);
    let tokens = series(&samples, |sample| sample.token_pct);

    let datasets = vec![
        Dataset::default()
            .name("CPU %")
            .marker(symbols::Marker::Braille)
            .graph_type(GraphType::Line)
            .style(Style::default().fg(theme::CPU_SERIES))
            .data(&cpu),
        Dataset::default()
            .name("Memory %")
            .marker(symbols::Marker::Braille)
            .graph_type(GraphType::Line)
            .style(Style::default().fg(theme::MEMORY_SERIES))
            .data(&memory),
        Dataset::default()
            .name("Tokens %")
            .marker(symbols::Marker::Braille)
            .graph_type(GraphType::Line)
            .style(Style::default().fg(theme::TOKEN_SERIES))
            .data(&tokens),
    ];

    let first_label = samples
        .first()
        .map(|sample| sample.label.clone())
        .unwrap_or_default();
    let last_label = samples
        .last()
        .map(|sample| sample.label.clone())
        .unwrap_or_default();
    let x_max = samples.len().saturating_sub(1).max(1) as f64;

    let chart = Chart::new(datasets)
        .block(panel("Performance"))
        .x_axis(
            Axis::default()
                .style(Style::default().fg(theme::MUTED))
                .bounds([0.0, x_max])
                .labels(vec![Span::raw(first_label), Span::raw(last_label)]),
        )
        .y_axis(
            Axis::default()
                .style(Style::default().fg(theme::MUTED))
                .bounds([0.0, 100.0])
                .labels(vec![Span::raw("0"), Span::raw("50"), Span::raw("100")]),
        );
    frame.render_widget(chart, area);
}

fn series(samples: &[&MetricSample], pick: impl Fn(&MetricSample) -> f64) -> Vec<(f64, f64)> {
    samples
        .iter()
        .enumerate()
        .map(|(index, sample)| (index as f64, pick(*sample)))
        .collect()
}

fn render_help_overlay(frame: &mut Frame) {
    let area = centered_rect(50, 30, frame.size());
    let lines = vec![
        Line::from(Span::styled("Keys", theme::TITLE_STYLE)),
        Line::from(""),
        Line::from("  ?        toggle this help"),
        Line::from("  Esc      close help"),
        Line::from("  q, C-c   quit"),
    ];
    frame.render_widget(Clear, area);
    frame.render_widget(
        Paragraph::new(Text::from(lines))
            .style(Style::default().fg(theme::TEXT))
            .block(panel("Help")),
        area,
    );
}

fn centered_rect(percent_x: u16, percent_y: u16, area: Rect) -> Rect {
    let vertical = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Percentage((100 - percent_y) / 2),
            Constraint::Percentage(percent_y),
            Constraint::Percentage((100 - percent_y) / 2),
        ])
        .split(area);
    Layout::default()
        .direction(Direction::Horizontal)
        .constraints([
            Constraint::Percentage((100 - percent_x) / 2),
            Constraint::Percentage(percent_x),
            Constraint::Percentage((100 - percent_x) / 2),
        ])
        .split(vertical[1])[1]
}
