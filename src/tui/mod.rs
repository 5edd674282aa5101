//! Ratatui-based terminal dashboard.
//!
//! Left: one filter panel per available dimension, cascading top to bottom.
//! Right: the daily chart (net asset value or cumulative net sales) above the
//! fund ranking. Every key press that changes the filters builds a new
//! `FilterState` and recomputes the whole `DashboardView`.

use std::io;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use crossterm::{
    event::{self, Event, KeyCode, KeyEventKind},
    execute,
    terminal::{EnterAlternateScreen, LeaveAlternateScreen, disable_raw_mode, enable_raw_mode},
};
use plotters::style::RGBColor;
use ratatui::{
    Terminal,
    backend::CrosstermBackend,
    layout::{Constraint, Direction, Layout, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span, Text},
    widgets::{Block, Borders, Cell, Clear, List, ListItem, Paragraph, Row, Table},
};

use crate::app::pipeline::{DashboardView, ViewConfig, build_view, export_filtered, with_quick_range};
use crate::domain::{DEFAULT_EXPORT_NAME, DateRange, FilterState, Measure, QuickRange, Selection};
use crate::error::AppError;
use crate::filter::CascadeLevel;
use crate::io::cache::SnapshotCache;
use crate::io::ingest::{Dataset, LoadOptions};
use crate::report::{DailyPoint, format_clp, truncate};

mod plotters_chart;

use plotters_chart::{SeriesPlottersChart, date_to_x, fmt_axis_date};

/// Everything the dashboard needs, prepared before the terminal is taken over.
pub struct TuiSetup {
    pub path: PathBuf,
    pub options: LoadOptions,
    pub cache: SnapshotCache,
    pub dataset: Arc<Dataset>,
    pub state: FilterState,
    pub view: ViewConfig,
    pub row_cap: usize,
}

/// Start the TUI.
pub fn run(setup: TuiSetup) -> Result<(), AppError> {
    let mut app = App::new(setup);

    let _guard = TerminalGuard::new()?;
    let backend = CrosstermBackend::new(io::stdout());
    let mut terminal = Terminal::new(backend)
        .map_err(|e| AppError::terminal(format!("Failed to initialize terminal: {e}")))?;

    app.event_loop(&mut terminal)
}

/// Ensures the terminal is restored (raw mode, alternate screen) on exit.
struct TerminalGuard;

impl TerminalGuard {
    fn new() -> Result<Self, AppError> {
        enable_raw_mode().map_err(|e| AppError::terminal(format!("Failed to enable raw mode: {e}")))?;
        if let Err(e) = execute!(io::stdout(), EnterAlternateScreen) {
            let _ = disable_raw_mode();
            return Err(AppError::terminal(format!("Failed to enter alternate screen: {e}")));
        }
        Ok(Self)
    }
}

impl Drop for TerminalGuard {
    fn drop(&mut self) {
        let _ = disable_raw_mode();
        let _ = execute!(io::stdout(), LeaveAlternateScreen);
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ChartTab {
    NetAssets,
    NetSales,
}

impl ChartTab {
    fn title(self) -> &'static str {
        match self {
            ChartTab::NetAssets => "Patrimonio Neto Total (MM CLP)",
            ChartTab::NetSales => "Venta Neta Acumulada (MM CLP)",
        }
    }

    fn color(self) -> RGBColor {
        match self {
            ChartTab::NetAssets => RGBColor(0, 255, 255),
            ChartTab::NetSales => RGBColor(0, 255, 0),
        }
    }
}

struct App {
    path: PathBuf,
    options: LoadOptions,
    cache: SnapshotCache,
    dataset: Arc<Dataset>,
    state: FilterState,
    view_config: ViewConfig,
    row_cap: usize,
    view: DashboardView,
    /// Index into `view.cascade.levels`.
    selected_dim: usize,
    /// Cursor within the selected dimension's options.
    cursor: usize,
    tab: ChartTab,
    editing_dates: bool,
    date_input: String,
    status: String,
    warning: bool,
}

impl App {
    fn new(setup: TuiSetup) -> Self {
        let view = build_view(&setup.dataset, &setup.state, setup.view);
        let status = format!("Loaded {} rows.", setup.dataset.records.len());
        Self {
            path: setup.path,
            options: setup.options,
            cache: setup.cache,
            dataset: setup.dataset,
            state: setup.state,
            view_config: setup.view,
            row_cap: setup.row_cap,
            view,
            selected_dim: 0,
            cursor: 0,
            tab: ChartTab::NetAssets,
            editing_dates: false,
            date_input: String::new(),
            status,
            warning: false,
        }
    }

    fn event_loop<B: ratatui::backend::Backend>(&mut self, terminal: &mut Terminal<B>) -> Result<(), AppError> {
        let mut needs_redraw = true;
        loop {
            if needs_redraw {
                terminal
                    .draw(|f| self.draw(f))
                    .map_err(|e| AppError::terminal(format!("Terminal draw error: {e}")))?;
                needs_redraw = false;
            }

            if !event::poll(Duration::from_millis(100))
                .map_err(|e| AppError::terminal(format!("Event poll error: {e}")))?
            {
                continue;
            }

            match event::read().map_err(|e| AppError::terminal(format!("Event read error: {e}")))? {
                Event::Key(key) => {
                    if key.kind != KeyEventKind::Press {
                        continue;
                    }
                    if self.handle_key(key.code) {
                        break;
                    }
                    needs_redraw = true;
                }
                Event::Resize(_, _) => {
                    needs_redraw = true;
                }
                _ => {}
            }
        }
        Ok(())
    }

    /// Returns `true` when the user asked to quit.
    fn handle_key(&mut self, code: KeyCode) -> bool {
        if self.editing_dates {
            self.handle_date_edit(code);
            return false;
        }

        match code {
            KeyCode::Char('q') => return true,
            KeyCode::Left => {
                self.selected_dim = self.selected_dim.saturating_sub(1);
                self.cursor = 0;
            }
            KeyCode::Right => {
                if self.selected_dim + 1 < self.view.cascade.levels.len() {
                    self.selected_dim += 1;
                    self.cursor = 0;
                }
            }
            KeyCode::Up => self.cursor = self.cursor.saturating_sub(1),
            KeyCode::Down => {
                let n = self.current_level().map(|l| l.options.len()).unwrap_or(0);
                if self.cursor + 1 < n {
                    self.cursor += 1;
                }
            }
            KeyCode::PageUp => self.cursor = self.cursor.saturating_sub(10),
            KeyCode::PageDown => {
                let n = self.current_level().map(|l| l.options.len()).unwrap_or(0);
                self.cursor = (self.cursor + 10).min(n.saturating_sub(1));
            }
            KeyCode::Char(' ') | KeyCode::Enter => self.toggle_current(),
            KeyCode::Char('a') => self.set_current_selection(Selection::All),
            KeyCode::Char('n') => self.set_current_selection(Selection::None),
            KeyCode::Tab => {
                self.tab = match self.tab {
                    ChartTab::NetAssets => ChartTab::NetSales,
                    ChartTab::NetSales => ChartTab::NetAssets,
                };
            }
            KeyCode::Char(c @ '1'..='6') => {
                let idx = c as usize - '1' as usize;
                self.apply_quick_range(QuickRange::ALL[idx]);
            }
            KeyCode::Char('c') => {
                self.update_state(self.state.with_date_range(None));
                self.set_status("Date range cleared.");
            }
            KeyCode::Char('d') => {
                self.editing_dates = true;
                self.date_input = self
                    .state
                    .date_range()
                    .map(|r| format!("{}..{}", r.start, r.end))
                    .unwrap_or_default();
                self.set_status("Editing dates (YYYY-MM-DD..YYYY-MM-DD). Enter to apply, Esc to cancel.");
            }
            KeyCode::Char('m') => {
                self.view_config.rank_measure = match self.view_config.rank_measure {
                    Measure::NetAssets => Measure::NetSales,
                    Measure::NetSales => Measure::NetAssets,
                };
                self.recompute();
                self.set_status(format!("Ranking by {}", self.view_config.rank_measure.display_name()));
            }
            KeyCode::Char('e') => self.export(),
            KeyCode::Char('R') => self.reload(),
            _ => {}
        }

        false
    }

    fn handle_date_edit(&mut self, code: KeyCode) {
        match code {
            KeyCode::Esc => {
                self.editing_dates = false;
                self.set_status("Date edit canceled.");
            }
            KeyCode::Enter => {
                self.editing_dates = false;
                self.apply_date_input();
            }
            KeyCode::Backspace => {
                self.date_input.pop();
            }
            KeyCode::Char(c) => {
                if c.is_ascii_digit() || c == '-' || c == '.' {
                    self.date_input.push(c);
                }
            }
            _ => {}
        }
    }

    fn apply_date_input(&mut self) {
        let trimmed = self.date_input.trim().to_string();
        if trimmed.is_empty() {
            self.update_state(self.state.with_date_range(None));
            self.set_status("Date range cleared.");
            return;
        }
        match parse_date_range(&trimmed) {
            Ok(range) => {
                self.update_state(self.state.with_date_range(Some(range)));
                self.set_status(format!("Dates: {} .. {}", range.start, range.end));
            }
            Err(msg) => self.set_warning(msg),
        }
    }

    fn current_level(&self) -> Option<&CascadeLevel> {
        self.view.cascade.levels.get(self.selected_dim)
    }

    fn toggle_current(&mut self) {
        let Some(level) = self.current_level() else { return };
        let Some(value) = level.options.get(self.cursor).cloned() else { return };
        let dimension = level.dimension;

        // Small dimensions behave like radio buttons.
        let next = if level.is_small() {
            if level.selection == Selection::only([value.clone()]) {
                Selection::All
            } else {
                Selection::only([value.clone()])
            }
        } else {
            level.selection.toggled(&value, &level.options)
        };

        self.update_state(self.state.with_selection(dimension, next));
        self.set_status(format!("{}: {value}", dimension.display_name()));
    }

    fn set_current_selection(&mut self, selection: Selection) {
        let Some(dimension) = self.current_level().map(|l| l.dimension) else { return };
        let label = match &selection {
            Selection::All => "all",
            Selection::None => "none",
            Selection::Only(_) => "some",
        };
        self.update_state(self.state.with_selection(dimension, selection));
        self.set_status(format!("{}: {label}", dimension.display_name()));
    }

    fn apply_quick_range(&mut self, quick: QuickRange) {
        let next = with_quick_range(&self.dataset, &self.state, quick);
        self.update_state(next);
        match self.state.date_range() {
            Some(r) => self.set_status(format!("{}: {} .. {}", quick.label(), r.start, r.end)),
            None => self.set_warning("No dates available for the current filters."),
        }
    }

    fn update_state(&mut self, state: FilterState) {
        self.state = state;
        self.recompute();
    }

    fn recompute(&mut self) {
        self.view = build_view(&self.dataset, &self.state, self.view_config);
        let n = self.current_level().map(|l| l.options.len()).unwrap_or(0);
        self.cursor = self.cursor.min(n.saturating_sub(1));
    }

    fn export(&mut self) {
        match export_filtered(&self.dataset, &self.state, self.row_cap) {
            Ok(bytes) => {
                let path = PathBuf::from(DEFAULT_EXPORT_NAME);
                match crate::io::export::write_export(&path, &bytes) {
                    Ok(()) => self.set_status(format!(
                        "Exported {} rows to {}",
                        self.view.subset_rows,
                        path.display()
                    )),
                    Err(err) => self.set_warning(err.to_string()),
                }
            }
            // The dashboard keeps running; the analyst narrows the filters instead.
            Err(err) => self.set_warning(err.to_string()),
        }
    }

    fn reload(&mut self) {
        let before = self.cache.loads();
        match self.cache.get_or_load(&self.path, &self.options) {
            Ok(dataset) => {
                self.dataset = dataset;
                self.recompute();
                if self.cache.loads() > before {
                    self.set_status(format!("Reloaded {} rows.", self.dataset.records.len()));
                } else {
                    self.set_status("Snapshot unchanged.");
                }
            }
            Err(err) => self.set_warning(err.to_string()),
        }
    }

    fn set_status(&mut self, msg: impl Into<String>) {
        self.status = msg.into();
        self.warning = false;
    }

    fn set_warning(&mut self, msg: impl Into<String>) {
        self.status = msg.into();
        self.warning = true;
    }

    fn draw(&mut self, frame: &mut ratatui::Frame<'_>) {
        let size = frame.area();
        let chunks = Layout::default()
            .direction(Direction::Vertical)
            .constraints([Constraint::Length(4), Constraint::Min(0), Constraint::Length(3)])
            .split(size);

        self.draw_header(frame, chunks[0]);
        self.draw_body(frame, chunks[1]);
        self.draw_footer(frame, chunks[2]);
    }

    fn draw_header(&self, frame: &mut ratatui::Frame<'_>, area: Rect) {
        let mut lines: Vec<Line> = Vec::new();
        lines.push(Line::from(vec![
            Span::styled("ffmm", Style::default().fg(Color::Cyan)),
            Span::raw(" Dashboard Fondos Mutuos | "),
            Span::styled(self.path.display().to_string(), Style::default().fg(Color::Gray)),
        ]));

        let bounds = self
            .view
            .date_bounds
            .map(|b| format!("{} .. {}", b.start, b.end))
            .unwrap_or_else(|| "-".to_string());
        let range = self
            .view
            .date_range
            .map(|r| format!("{} .. {}", r.start, r.end))
            .unwrap_or_else(|| "todas".to_string());
        lines.push(Line::from(Span::styled(
            format!(
                "rows: {} of {} | fechas disponibles: {bounds} | rango: {range}",
                self.view.subset_rows, self.view.total_rows,
            ),
            Style::default().fg(Color::Gray),
        )));

        let p = Paragraph::new(Text::from(lines)).block(Block::default().borders(Borders::ALL));
        frame.render_widget(p, area);
    }

    fn draw_body(&self, frame: &mut ratatui::Frame<'_>, area: Rect) {
        let cols = Layout::default()
            .direction(Direction::Horizontal)
            .constraints([Constraint::Length(42), Constraint::Min(0)])
            .split(area);

        self.draw_filters(frame, cols[0]);

        let right = Layout::default()
            .direction(Direction::Vertical)
            .constraints([Constraint::Percentage(55), Constraint::Percentage(45)])
            .split(cols[1]);
        self.draw_chart(frame, right[0]);
        self.draw_ranking(frame, right[1]);
    }

    fn draw_filters(&self, frame: &mut ratatui::Frame<'_>, area: Rect) {
        let n = self.view.cascade.levels.len() as u16;
        let rows = Layout::default()
            .direction(Direction::Vertical)
            .constraints([Constraint::Length(n + 2), Constraint::Min(0)])
            .split(area);

        let items: Vec<ListItem> = self
            .view
            .cascade
            .levels
            .iter()
            .map(|l| {
                let summary = match &l.selection {
                    Selection::All => format!("todos ({})", l.options.len()),
                    Selection::None => "ninguno".to_string(),
                    Selection::Only(_) => format!("{}/{}", l.chosen_count(), l.options.len()),
                };
                ListItem::new(format!("{:<18} {summary}", l.dimension.display_name()))
            })
            .collect();
        let list = List::new(items)
            .block(Block::default().title("Filtros (←/→)").borders(Borders::ALL))
            .highlight_style(Style::default().fg(Color::Black).bg(Color::White))
            .highlight_symbol("» ");
        let mut state = ratatui::widgets::ListState::default();
        state.select(Some(self.selected_dim));
        frame.render_stateful_widget(list, rows[0], &mut state);

        let Some(level) = self.current_level() else { return };
        let mark = |chosen: bool| match (level.is_small(), chosen) {
            (true, true) => "(•)",
            (true, false) => "( )",
            (false, true) => "[x]",
            (false, false) => "[ ]",
        };
        let items: Vec<ListItem> = level
            .options
            .iter()
            .map(|o| {
                let chosen = level.selection.is_chosen(o);
                ListItem::new(format!("{} {}", mark(chosen), truncate(o, 34)))
            })
            .collect();
        let title = if level.options.is_empty() {
            format!("{} (sin opciones)", level.dimension.display_name())
        } else {
            level.dimension.display_name().to_string()
        };
        let list = List::new(items)
            .block(Block::default().title(title).borders(Borders::ALL))
            .highlight_style(Style::default().add_modifier(Modifier::REVERSED));
        let mut state = ratatui::widgets::ListState::default();
        if !level.options.is_empty() {
            state.select(Some(self.cursor));
        }
        frame.render_stateful_widget(list, rows[1], &mut state);
    }

    fn draw_chart(&self, frame: &mut ratatui::Frame<'_>, area: Rect) {
        let block = Block::default()
            .title(format!("{} (Tab)", self.tab.title()))
            .borders(Borders::ALL);
        let inner = block.inner(area);
        frame.render_widget(block, area);
        frame.render_widget(Clear, inner);

        let series = match self.tab {
            ChartTab::NetAssets => &self.view.net_assets,
            ChartTab::NetSales => &self.view.net_sales_cumulative,
        };
        let Some((points, x_bounds, y_bounds)) = chart_series(series) else {
            let msg = Paragraph::new("No hay datos disponibles con los filtros seleccionados.")
                .style(Style::default().fg(Color::Yellow));
            frame.render_widget(msg, inner);
            return;
        };

        let widget = SeriesPlottersChart {
            series: &points,
            x_bounds,
            y_bounds,
            x_label: "fecha",
            y_label: "MM CLP",
            color: self.tab.color(),
            fmt_x: fmt_axis_date,
            fmt_y: format_clp,
        };
        frame.render_widget(widget, inner);
    }

    fn draw_ranking(&self, frame: &mut ratatui::Frame<'_>, area: Rect) {
        let ranking = &self.view.ranking;
        let title = format!(
            "Top {} de {} fondos por {} (m)",
            ranking.rows.len(),
            ranking.total_funds,
            ranking.measure.display_name()
        );
        let block = Block::default().title(title).borders(Borders::ALL);

        if ranking.rows.is_empty() {
            let p = Paragraph::new("Sin datos.")
                .style(Style::default().fg(Color::Yellow))
                .block(block);
            frame.render_widget(p, area);
            return;
        }

        let header = Row::new(vec!["#", "RUN", "Fondo", "Administradora", "MM CLP"])
            .style(Style::default().add_modifier(Modifier::BOLD));
        let rows: Vec<Row> = ranking
            .rows
            .iter()
            .enumerate()
            .map(|(i, r)| {
                Row::new(vec![
                    Cell::from((i + 1).to_string()),
                    Cell::from(r.run_fm.clone()),
                    Cell::from(r.short_name.clone()),
                    Cell::from(r.administrator.clone()),
                    Cell::from(Line::from(format_clp(r.total)).right_aligned()),
                ])
            })
            .collect();

        let widths = [
            Constraint::Length(4),
            Constraint::Length(8),
            Constraint::Percentage(35),
            Constraint::Percentage(35),
            Constraint::Length(16),
        ];
        let table = Table::new(rows, widths).header(header).block(block);
        frame.render_widget(table, area);
    }

    fn draw_footer(&self, frame: &mut ratatui::Frame<'_>, area: Rect) {
        let help = "↑/↓ opción  Space marcar  a todos  n ninguno  1-6 1M/3M/6M/YTD/1A/Todo  d fechas  c limpiar  e CSV  R recargar  q salir";
        let status_style = if self.warning {
            Style::default().fg(Color::Red).add_modifier(Modifier::BOLD)
        } else {
            Style::default().fg(Color::Yellow)
        };
        let line = Line::from(vec![
            Span::styled(help, Style::default().fg(Color::Gray)),
            Span::raw(" | "),
            Span::styled(&self.status, status_style),
        ]);
        let p = Paragraph::new(line).block(Block::default().borders(Borders::ALL));
        frame.render_widget(p, area);
    }
}

/// Build chart points and padded bounds; `None` when there is nothing to draw.
fn chart_series(series: &[DailyPoint]) -> Option<(Vec<(f64, f64)>, [f64; 2], [f64; 2])> {
    let first = series.first()?;
    let last = series.last()?;

    let points: Vec<(f64, f64)> = series.iter().map(|p| (date_to_x(p.date), p.value)).collect();

    let mut x_bounds = [date_to_x(first.date), date_to_x(last.date)];
    if x_bounds[1] <= x_bounds[0] {
        x_bounds = [x_bounds[0] - 1.0, x_bounds[1] + 1.0];
    }

    let (mut y_min, mut y_max) = (f64::INFINITY, f64::NEG_INFINITY);
    for &(_, y) in &points {
        y_min = y_min.min(y);
        y_max = y_max.max(y);
    }
    if !y_min.is_finite() || !y_max.is_finite() {
        return None;
    }
    if y_max <= y_min {
        y_min -= 1.0;
        y_max += 1.0;
    }
    let pad = ((y_max - y_min).abs() * 0.05).max(1e-9);

    Some((points, x_bounds, [y_min - pad, y_max + pad]))
}

/// Parse `YYYY-MM-DD..YYYY-MM-DD`; either side may be omitted.
fn parse_date_range(input: &str) -> Result<DateRange, String> {
    let (from, to) = input.split_once("..").unwrap_or((input, input));
    let parse = |s: &str, fallback: chrono::NaiveDate| -> Result<chrono::NaiveDate, String> {
        let s = s.trim();
        if s.is_empty() {
            return Ok(fallback);
        }
        chrono::NaiveDate::parse_from_str(s, "%Y-%m-%d").map_err(|e| format!("Invalid date '{s}': {e}"))
    };
    let start = parse(from, chrono::NaiveDate::MIN)?;
    let end = parse(to, chrono::NaiveDate::MAX)?;
    DateRange::new(start, end).ok_or_else(|| format!("Start {start} is after end {end}."))
}
