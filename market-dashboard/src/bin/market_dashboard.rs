/// Market Dashboard
///
/// Mounts the shared dashboard against the market-data API and renders the
/// summary cards, ranked movers and per-panel status once per second.
use std::{
    error::Error,
    fs::File,
    io,
    sync::Arc,
    time::{Duration, Instant},
};

use chrono::{DateTime, Utc};
use crossterm::{
    event::{self, DisableMouseCapture, EnableMouseCapture, Event, KeyCode, KeyEventKind},
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
};
use market_dashboard::{
    format_change_percent, format_price, format_volume, ApiStatus, Dashboard, DashboardConfig,
    DashboardSnapshot, DashboardView, HttpMarketDataApi, PanelId, PanelState, PanelStatus,
    PerformanceMetrics, Stock, StockPrice,
};
use parking_lot::Mutex;
use ratatui::{
    backend::CrosstermBackend,
    layout::{Alignment, Constraint, Direction, Layout, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Cell, Paragraph, Row, Table, Wrap},
    Frame, Terminal,
};
use tracing::{info, warn};

/// Backend check results shown in the status line
#[derive(Debug, Default)]
struct BackendStatus {
    health: Option<ApiStatus>,
    metrics: Option<PerformanceMetrics>,
    /// Latest daily bar of the selected symbol
    last_close: Option<StockPrice>,
    reachable: bool,
}

/// Log to DASHBOARD_LOG_FILE (default: market-dashboard.log); the terminal
/// belongs to the UI
fn init_logging() -> Result<(), Box<dyn Error>> {
    let path =
        std::env::var("DASHBOARD_LOG_FILE").unwrap_or_else(|_| "market-dashboard.log".to_string());
    let file = File::create(path)?;

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_ansi(false)
        .with_writer(std::sync::Mutex::new(file))
        .init();
    Ok(())
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
    init_logging()?;

    let config = DashboardConfig::from_env();
    info!(api_url = %config.api_url, symbol = %config.default_symbol, "starting market dashboard");

    let api = Arc::new(HttpMarketDataApi::new(&config));
    let dashboard = Dashboard::new(api.clone(), config)?;

    let backend_status = Arc::new(Mutex::new(BackendStatus::default()));
    {
        let api = Arc::clone(&api);
        let dashboard = dashboard.clone();
        let status = Arc::clone(&backend_status);
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(Duration::from_secs(60));
            loop {
                interval.tick().await;
                let symbol = dashboard.selection().symbol;
                let (health, metrics, history) = tokio::join!(
                    api.health(),
                    api.performance_metrics(),
                    api.price_history(&symbol, 5)
                );
                if let Err(error) = &health {
                    warn!(%error, "backend health check failed");
                }
                let mut guard = status.lock();
                guard.reachable = health.is_ok();
                guard.health = health.ok();
                guard.metrics = metrics.ok();
                guard.last_close = history.ok().and_then(|mut bars| bars.pop());
            }
        });
    }

    // Setup panic hook to restore terminal on crash
    let original_hook = std::panic::take_hook();
    std::panic::set_hook(Box::new(move |panic_info| {
        let _ = disable_raw_mode();
        let _ = execute!(io::stdout(), LeaveAlternateScreen, DisableMouseCapture);
        original_hook(panic_info);
    }));

    enable_raw_mode()?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen, EnableMouseCapture)?;
    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend)?;

    dashboard.mount();

    let tick_rate = Duration::from_secs(1);
    let mut last_tick = Instant::now();
    let mut redraw = true;

    loop {
        if redraw || last_tick.elapsed() >= tick_rate {
            let snapshot = dashboard.snapshot();
            let status = backend_status.lock();
            terminal.draw(|f| render_ui(f, &snapshot, &status))?;
            drop(status);
            last_tick = Instant::now();
            redraw = false;
        }

        let timeout = tick_rate
            .checked_sub(last_tick.elapsed())
            .unwrap_or_else(|| Duration::from_secs(0));
        if event::poll(timeout)? {
            if let Event::Key(key) = event::read()? {
                if key.kind != KeyEventKind::Press {
                    continue;
                }
                match key.code {
                    KeyCode::Char('q') | KeyCode::Esc => break,
                    KeyCode::Char('r') => dashboard.refresh_all(),
                    KeyCode::Char('R') => {
                        dashboard.retry();
                    }
                    KeyCode::Left => step_symbol(&dashboard, -1),
                    KeyCode::Right => step_symbol(&dashboard, 1),
                    KeyCode::Char(digit @ '1'..='5') => {
                        if let Some(panel) = panel_for_key(digit) {
                            dashboard.refresh(panel);
                        }
                    }
                    KeyCode::Char('t') => {
                        let selection = dashboard.selection();
                        if let Err(error) =
                            dashboard.select(&selection.symbol, selection.timeframe.next())
                        {
                            warn!(%error, "timeframe change rejected");
                        }
                    }
                    _ => {}
                }
                redraw = true;
            }
        }
    }

    dashboard.teardown();

    disable_raw_mode()?;
    execute!(
        terminal.backend_mut(),
        LeaveAlternateScreen,
        DisableMouseCapture
    )?;
    terminal.show_cursor()?;
    Ok(())
}

/// Digit keys `1`-`5` retry a single panel, in [`PanelId::ALL`] order
fn panel_for_key(key: char) -> Option<PanelId> {
    let index = key.to_digit(10)?.checked_sub(1)?;
    PanelId::ALL.get(index as usize).copied()
}

/// Move the selection through the fetched symbol list, wrapping at the ends
fn step_symbol(dashboard: &Dashboard, step: isize) {
    let snapshot = dashboard.snapshot();
    let Some(list) = snapshot.symbols.data.as_ref() else {
        return;
    };
    if list.symbols.is_empty() {
        return;
    }

    let len = list.symbols.len() as isize;
    let current = list
        .symbols
        .iter()
        .position(|s| *s == snapshot.selection.symbol)
        .map(|i| i as isize)
        .unwrap_or(if step < 0 { 0 } else { -1 });
    let next = (current + step).rem_euclid(len) as usize;

    if let Err(error) = dashboard.select(&list.symbols[next], snapshot.selection.timeframe) {
        warn!(%error, "symbol change rejected");
    }
}

fn render_ui(f: &mut Frame, snapshot: &DashboardSnapshot, backend: &BackendStatus) {
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(3),
            Constraint::Min(0),
            Constraint::Length(1),
        ])
        .split(f.area());

    render_header(f, snapshot, backend, chunks[0]);

    match &snapshot.view {
        DashboardView::Loading => render_full_screen(
            f,
            chunks[1],
            "Loading market data...",
            Color::Yellow,
        ),
        DashboardView::Error { message } => render_full_screen(
            f,
            chunks[1],
            &format!("{}. Press R to retry.", message),
            Color::Red,
        ),
        DashboardView::Ready => render_body(f, snapshot, chunks[1]),
    }

    let help = Paragraph::new(Line::from(Span::styled(
        " q quit  r refresh  R retry  1-5 retry panel  ←/→ symbol  t timeframe",
        Style::default().fg(Color::DarkGray),
    )));
    f.render_widget(help, chunks[2]);
}

fn render_header(f: &mut Frame, snapshot: &DashboardSnapshot, backend: &BackendStatus, area: Rect) {
    let block = Block::default()
        .title(" MARKET DASHBOARD ")
        .borders(Borders::ALL)
        .border_style(Style::default().fg(Color::White));

    let api = match (&backend.health, backend.reachable) {
        (Some(health), true) if health.is_active() => {
            Span::styled("API active", Style::default().fg(Color::Green))
        }
        (Some(health), true) => Span::styled(
            format!("API {}", health.status),
            Style::default().fg(Color::Yellow),
        ),
        _ => Span::styled("API unreachable", Style::default().fg(Color::Red)),
    };

    let mut spans = vec![
        Span::styled(
            format!("{} ", snapshot.selection.symbol),
            Style::default()
                .fg(Color::Cyan)
                .add_modifier(Modifier::BOLD),
        ),
        Span::raw(format!("{}  ", snapshot.selection.timeframe)),
        api,
    ];
    if let Some(bar) = &backend.last_close {
        spans.push(Span::styled(
            format!("  {} close {}", bar.symbol, format_price(bar.close)),
            Style::default().fg(Color::DarkGray),
        ));
    }
    if let Some(metrics) = &backend.metrics {
        spans.push(Span::styled(
            format!(
                "  cache {}/{}  uptime {}",
                metrics.cache_size, metrics.cache_maxsize, metrics.uptime
            ),
            Style::default().fg(Color::DarkGray),
        ));
    }
    if let Some(at) = snapshot.summary.last_fetched_at {
        spans.push(Span::styled(
            format!("  updated {}", at.format("%H:%M:%S")),
            Style::default().fg(Color::DarkGray),
        ));
    }

    f.render_widget(Paragraph::new(Line::from(spans)).block(block), area);
}

fn render_full_screen(f: &mut Frame, area: Rect, text: &str, color: Color) {
    let paragraph = Paragraph::new(Line::from(Span::styled(
        text.to_string(),
        Style::default().fg(color).add_modifier(Modifier::BOLD),
    )))
    .alignment(Alignment::Center)
    .block(Block::default().borders(Borders::ALL))
    .wrap(Wrap { trim: true });
    f.render_widget(paragraph, area);
}

fn render_body(f: &mut Frame, snapshot: &DashboardSnapshot, area: Rect) {
    let rows = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(5),
            Constraint::Percentage(55),
            Constraint::Min(0),
        ])
        .split(area);

    render_cards(f, snapshot, rows[0]);

    let tables = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([
            Constraint::Percentage(34),
            Constraint::Percentage(33),
            Constraint::Percentage(33),
        ])
        .split(rows[1]);

    if let Some(summary) = snapshot.summary.data.as_ref() {
        render_movers(f, " TOP GAINERS ", &summary.top_gainers, tables[0]);
        render_movers(f, " TOP LOSERS ", &summary.top_losers, tables[1]);
        render_movers(f, " MOST ACTIVE ", &summary.most_active, tables[2]);
    }

    let panels = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([
            Constraint::Percentage(34),
            Constraint::Percentage(33),
            Constraint::Percentage(33),
        ])
        .split(rows[2]);

    let chart_detail = snapshot.chart.data.as_ref().map(|pair| {
        vec![
            format!("{} {}", pair.selection.symbol, pair.selection.timeframe),
            format!(
                "candlestick: {} trace(s){}",
                pair.candlestick.trace_count(),
                title_suffix(pair.candlestick.title())
            ),
            format!(
                "volume: {} trace(s){}",
                pair.volume.trace_count(),
                title_suffix(pair.volume.title())
            ),
        ]
    });
    render_panel(f, PanelId::Chart, &snapshot.chart, chart_detail, panels[0]);

    let heatmap_detail = snapshot.heatmap.data.as_ref().map(|blob| {
        vec![format!(
            "{} trace(s){}",
            blob.trace_count(),
            title_suffix(blob.title())
        )]
    });
    render_panel(f, PanelId::Heatmap, &snapshot.heatmap, heatmap_detail, panels[1]);

    let correlation_detail = snapshot.correlation.data.as_ref().map(|blob| {
        vec![format!(
            "{} trace(s){}",
            blob.trace_count(),
            title_suffix(blob.title())
        )]
    });
    render_panel(
        f,
        PanelId::Correlation,
        &snapshot.correlation,
        correlation_detail,
        panels[2],
    );
}

fn title_suffix(title: Option<&str>) -> String {
    title.map(|t| format!(" - {}", t)).unwrap_or_default()
}

fn render_cards(f: &mut Frame, snapshot: &DashboardSnapshot, area: Rect) {
    let Some(metrics) = snapshot.metrics.as_ref() else {
        return;
    };

    let cards = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([Constraint::Ratio(1, 6); 6])
        .split(area);

    render_card(f, "SYMBOLS", metrics.total_symbols.to_string(), None, cards[0]);
    render_card(f, "MARKET CAP", metrics.formatted_market_cap.clone(), None, cards[1]);
    render_card(f, "VOLUME", metrics.formatted_volume.clone(), None, cards[2]);
    render_stock_card(f, "TOP GAINER", metrics.top_gainer.as_ref(), cards[3]);
    render_stock_card(f, "TOP LOSER", metrics.top_loser.as_ref(), cards[4]);
    render_stock_card(f, "MOST ACTIVE", metrics.most_active.as_ref(), cards[5]);
}

fn render_stock_card(f: &mut Frame, title: &str, stock: Option<&Stock>, area: Rect) {
    match stock {
        Some(stock) => render_card(
            f,
            title,
            stock.symbol.clone(),
            Some((
                format_change_percent(stock.change_percent),
                change_color(stock),
            )),
            area,
        ),
        None => render_card(f, title, "-".to_string(), None, area),
    }
}

fn render_card(
    f: &mut Frame,
    title: &str,
    value: String,
    detail: Option<(String, Color)>,
    area: Rect,
) {
    let block = Block::default()
        .title(format!(" {} ", title))
        .borders(Borders::ALL)
        .border_style(Style::default().fg(Color::White));

    let mut lines = vec![Line::from(Span::styled(
        value,
        Style::default()
            .fg(Color::White)
            .add_modifier(Modifier::BOLD),
    ))];
    if let Some((detail, color)) = detail {
        lines.push(Line::from(Span::styled(detail, Style::default().fg(color))));
    }

    f.render_widget(Paragraph::new(lines).block(block), area);
}

fn change_color(stock: &Stock) -> Color {
    if stock.change_percent.is_sign_negative() && !stock.change_percent.is_zero() {
        Color::Red
    } else {
        Color::Green
    }
}

fn render_movers(f: &mut Frame, title: &str, stocks: &[Stock], area: Rect) {
    let header_cells = ["SYMBOL", "PRICE", "CHANGE", "VOLUME"].iter().map(|h| {
        Cell::from(*h).style(
            Style::default()
                .fg(Color::Yellow)
                .add_modifier(Modifier::BOLD),
        )
    });
    let header = Row::new(header_cells).height(1);

    let rows = stocks.iter().map(|stock| {
        Row::new(vec![
            Cell::from(stock.symbol.clone()).style(Style::default().fg(Color::Cyan)),
            Cell::from(format_price(stock.current_price)),
            Cell::from(format_change_percent(stock.change_percent))
                .style(Style::default().fg(change_color(stock))),
            Cell::from(format_volume(stock.volume)),
        ])
        .height(1)
    });

    let table = Table::new(
        rows,
        [
            Constraint::Length(7),
            Constraint::Length(10),
            Constraint::Length(9),
            Constraint::Length(9),
        ],
    )
    .header(header)
    .block(
        Block::default()
            .borders(Borders::ALL)
            .title(title.to_string())
            .border_style(Style::default().fg(Color::White)),
    );

    f.render_widget(table, area);
}

fn render_panel<T>(
    f: &mut Frame,
    panel: PanelId,
    state: &PanelState<T>,
    detail: Option<Vec<String>>,
    area: Rect,
) {
    let block = Block::default()
        .title(format!(" {} ", panel.label().to_uppercase()))
        .borders(Borders::ALL)
        .border_style(Style::default().fg(Color::White));

    let (label, color) = match state.status {
        PanelStatus::Idle => ("idle", Color::DarkGray),
        PanelStatus::Loading => ("loading", Color::Yellow),
        PanelStatus::Ready => ("ready", Color::Green),
        PanelStatus::Error => ("error", Color::Red),
    };

    let mut lines = vec![Line::from(vec![
        Span::styled(label, Style::default().fg(color).add_modifier(Modifier::BOLD)),
        Span::styled(
            fetched_suffix(state.last_fetched_at),
            Style::default().fg(Color::DarkGray),
        ),
    ])];
    if let Some(error) = &state.error {
        lines.push(Line::from(Span::styled(
            error.clone(),
            Style::default().fg(Color::Red),
        )));
    }
    for line in detail.unwrap_or_default() {
        lines.push(Line::from(line));
    }

    let paragraph = Paragraph::new(lines).block(block).wrap(Wrap { trim: true });
    f.render_widget(paragraph, area);
}

fn fetched_suffix(at: Option<DateTime<Utc>>) -> String {
    at.map(|at| format!("  {}", at.format("%H:%M:%S")))
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_panel_for_key() {
        struct TestCase {
            input: char,
            expected: Option<PanelId>,
        }

        let tests = vec![
            TestCase {
                // TC0: first panel
                input: '1',
                expected: Some(PanelId::Summary),
            },
            TestCase {
                // TC1: chart
                input: '3',
                expected: Some(PanelId::Chart),
            },
            TestCase {
                // TC2: last panel
                input: '5',
                expected: Some(PanelId::Correlation),
            },
            TestCase {
                // TC3: zero is not a panel
                input: '0',
                expected: None,
            },
            TestCase {
                // TC4: past the last panel
                input: '6',
                expected: None,
            },
            TestCase {
                // TC5: not a digit
                input: 'r',
                expected: None,
            },
        ];

        for (index, test) in tests.into_iter().enumerate() {
            assert_eq!(panel_for_key(test.input), test.expected, "TC{} failed", index);
        }
    }
}
