pub mod cell_format;

use std::io::{self, Stdout};
use std::sync::Arc;
use std::time::Duration;

use crossterm::event::{
    self, DisableMouseCapture, EnableMouseCapture, Event, KeyCode, KeyEvent, KeyEventKind,
    KeyModifiers,
};
use crossterm::execute;
use crossterm::terminal::{
    disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen,
};
use fmv_adapters::sheets::{GvizHttpSource, SheetsAdapterError};
use fmv_core::config::ViewerConfig;
use fmv_core::data_engine::{CompletionOutcome, DataEngine, EnginePhase};
use fmv_core::fetch_runner::{FetchCompletion, FetchRequest, FetchRunner, SheetSource};
use fmv_core::fields::Field;
use fmv_core::view_state::{PageStateError, SortDirection};
use ratatui::backend::{Backend, CrosstermBackend};
use ratatui::layout::{Alignment, Constraint, Direction, Layout, Rect};
use ratatui::style::{Color, Modifier, Style};
use ratatui::text::{Line, Span};
use ratatui::widgets::{Block, Borders, Cell, Clear, Paragraph, Row, Table, TableState};
use ratatui::{Frame, Terminal};
use thiserror::Error;
use tokio::runtime::Handle;
use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};
use tracing::{debug, info};

use crate::cell_format::display_value;

const TICK_RATE: Duration = Duration::from_millis(120);
const TITLE: &str = "FMCSA Viewer";

#[derive(Debug, Error)]
pub enum TuiError {
    #[error("i/o error: {0}")]
    Io(#[from] io::Error),
    #[error("failed to prepare data source: {0}")]
    Source(#[from] SheetsAdapterError),
    #[error("invalid view settings: {0}")]
    Settings(#[from] PageStateError),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Msg {
    Quit,
    ToggleHelp,
    FocusNext,
    FocusPrevious,
    Type(char),
    Erase,
    ClearFocusedFilter,
    ClearFilters,
    ToggleSort,
    ClearSort,
    NextPage,
    PreviousPage,
    FirstPage,
    CyclePageSize,
    Reload,
    CursorUp,
    CursorDown,
}

#[derive(Debug)]
struct BrowserApp {
    engine: DataEngine,
    config: ViewerConfig,
    focused: Field,
    cursor: usize,
    show_help: bool,
    should_quit: bool,
    status_line: String,
}

impl BrowserApp {
    fn new(config: ViewerConfig) -> Result<Self, PageStateError> {
        Ok(Self {
            engine: DataEngine::new(config.engine_settings())?,
            config,
            focused: Field::LegalName,
            cursor: 0,
            show_help: false,
            should_quit: false,
            status_line: "Type to filter the focused column, F1 for help".to_string(),
        })
    }

    fn mount(&mut self) -> FetchRequest {
        self.status_line = "Loading data...".to_string();
        self.engine.mount()
    }

    fn handle(&mut self, msg: Msg) -> Option<FetchRequest> {
        match msg {
            Msg::Quit => {
                self.should_quit = true;
                None
            }
            Msg::ToggleHelp => {
                self.show_help = !self.show_help;
                None
            }
            Msg::FocusNext => {
                self.focused = self.focused.next();
                self.status_line = format!("Filtering {}", self.focused.label());
                None
            }
            Msg::FocusPrevious => {
                self.focused = self.focused.previous();
                self.status_line = format!("Filtering {}", self.focused.label());
                None
            }
            Msg::Type(ch) => {
                let mut pattern = self.engine.filters().pattern(self.focused).to_string();
                pattern.push(ch);
                self.edit_filter(pattern)
            }
            Msg::Erase => {
                let mut pattern = self.engine.filters().pattern(self.focused).to_string();
                if pattern.pop().is_none() {
                    return None;
                }
                self.edit_filter(pattern)
            }
            Msg::ClearFocusedFilter => {
                self.cursor = 0;
                self.status_line = format!("Cleared filter on {}", self.focused.label());
                self.engine.clear_filter(self.focused)
            }
            Msg::ClearFilters => {
                self.cursor = 0;
                self.status_line = "Cleared all filters".to_string();
                self.engine.clear_filters()
            }
            Msg::ToggleSort => {
                let request = self.engine.toggle_sort(self.focused);
                self.status_line = match self.engine.sort().direction_for(self.focused) {
                    Some(SortDirection::Ascending) => {
                        format!("Sorted by {} ascending", self.focused.label())
                    }
                    Some(SortDirection::Descending) => {
                        format!("Sorted by {} descending", self.focused.label())
                    }
                    None => "Sort cleared".to_string(),
                };
                request
            }
            Msg::ClearSort => {
                self.status_line = "Sort cleared".to_string();
                self.engine.clear_sort()
            }
            Msg::NextPage => {
                let page = self.engine.page();
                if page.index() >= self.last_page_index() {
                    self.status_line = "Already on the last page".to_string();
                    return None;
                }
                self.change_page(page.index() + 1)
            }
            Msg::PreviousPage => {
                let page = self.engine.page();
                if page.index() == 0 {
                    self.status_line = "Already on the first page".to_string();
                    return None;
                }
                self.change_page(page.index() - 1)
            }
            Msg::FirstPage => self.change_page(0),
            Msg::CyclePageSize => {
                let next_size = self.config.next_page_size(self.engine.page().size());
                match self.engine.set_page_size(next_size) {
                    Ok(request) => {
                        self.cursor = 0;
                        self.status_line = format!("Rows per page: {next_size}");
                        request
                    }
                    Err(error) => {
                        self.status_line = format!("Cannot change page size: {error}");
                        None
                    }
                }
            }
            Msg::Reload => {
                self.status_line = "Reloading page...".to_string();
                Some(self.engine.reload())
            }
            Msg::CursorUp => {
                self.cursor = self.cursor.saturating_sub(1);
                None
            }
            Msg::CursorDown => {
                let visible = self.engine.rows().len();
                self.cursor = (self.cursor + 1).min(visible.saturating_sub(1));
                None
            }
        }
    }

    fn on_completion(&mut self, completion: FetchCompletion) {
        match self.engine.complete(completion) {
            CompletionOutcome::Applied { rows } => {
                self.status_line = format!("Loaded {rows} rows");
                self.clamp_cursor();
            }
            CompletionOutcome::Failed => {
                if let Some(message) = self.engine.error() {
                    self.status_line = message.to_string();
                }
            }
            CompletionOutcome::DiscardedStale { sequence, latest } => {
                debug!(sequence, latest, "ignored superseded page");
            }
        }
    }

    fn edit_filter(&mut self, pattern: String) -> Option<FetchRequest> {
        self.cursor = 0;
        self.engine.set_filter(self.focused, pattern)
    }

    fn change_page(&mut self, index: usize) -> Option<FetchRequest> {
        let request = self.engine.set_page(index);
        if request.is_some() {
            self.cursor = 0;
            self.status_line = format!("Loading page {}...", index + 1);
        }
        request
    }

    fn clamp_cursor(&mut self) {
        let visible = self.engine.rows().len();
        self.cursor = self.cursor.min(visible.saturating_sub(1));
    }

    fn nominal_count(&self) -> usize {
        usize::try_from(self.engine.nominal_row_count()).unwrap_or(usize::MAX)
    }

    fn last_page_index(&self) -> usize {
        let count = self.nominal_count();
        if count == 0 {
            return 0;
        }
        (count - 1) / self.engine.page().size()
    }

    fn page_summary(&self) -> String {
        let page = self.engine.page();
        let count = self.nominal_count();
        let from = if count == 0 {
            0
        } else {
            page.start_offset() + 1
        };
        let to = page.start_offset().saturating_add(page.size()).min(count);
        format!(
            "Rows per page: {} | {from}–{to} of ~{count} | Page {}",
            page.size(),
            page.index() + 1
        )
    }
}

/// Runs fetches on the tokio runtime and hands completions back to the UI
/// thread through a channel.
struct FetchDispatcher<S: SheetSource> {
    handle: Handle,
    runner: Arc<FetchRunner<S>>,
    sender: UnboundedSender<FetchCompletion>,
    receiver: UnboundedReceiver<FetchCompletion>,
}

impl<S> FetchDispatcher<S>
where
    S: SheetSource + Send + Sync + 'static,
{
    fn new(handle: Handle, source: S) -> Self {
        let (sender, receiver) = mpsc::unbounded_channel();
        Self {
            handle,
            runner: Arc::new(FetchRunner::new(source)),
            sender,
            receiver,
        }
    }

    fn dispatch(&self, request: FetchRequest) {
        let runner = Arc::clone(&self.runner);
        let sender = self.sender.clone();
        self.handle.spawn(async move {
            let completion = runner.execute(request).await;
            // A closed channel means the UI has already exited.
            let _ = sender.send(completion);
        });
    }

    fn drain(&mut self) -> Vec<FetchCompletion> {
        let mut completions = Vec::new();
        while let Ok(completion) = self.receiver.try_recv() {
            completions.push(completion);
        }
        completions
    }
}

#[must_use]
pub fn ui_name() -> &'static str {
    "fmv-tui"
}

pub fn run(config: ViewerConfig) -> Result<(), TuiError> {
    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()?;
    let source = GvizHttpSource::from_config(&config)?;
    info!(dataset = source.dataset_id(), "starting browser");
    let mut dispatcher = FetchDispatcher::new(runtime.handle().clone(), source);
    let mut app = BrowserApp::new(config)?;

    let mut terminal = setup_terminal()?;
    let run_result = run_loop(&mut terminal, &mut app, &mut dispatcher);
    let restore_result = restore_terminal(&mut terminal);

    if let Err(error) = run_result {
        restore_result?;
        return Err(error);
    }

    restore_result?;
    Ok(())
}

fn setup_terminal() -> Result<Terminal<CrosstermBackend<Stdout>>, TuiError> {
    enable_raw_mode()?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen, EnableMouseCapture)?;
    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend)?;
    terminal.clear()?;
    Ok(terminal)
}

fn restore_terminal(terminal: &mut Terminal<CrosstermBackend<Stdout>>) -> Result<(), TuiError> {
    disable_raw_mode()?;
    execute!(
        terminal.backend_mut(),
        LeaveAlternateScreen,
        DisableMouseCapture
    )?;
    terminal.show_cursor()?;
    Ok(())
}

fn run_loop<B, S>(
    terminal: &mut Terminal<B>,
    app: &mut BrowserApp,
    dispatcher: &mut FetchDispatcher<S>,
) -> Result<(), TuiError>
where
    B: Backend,
    S: SheetSource + Send + Sync + 'static,
{
    dispatcher.dispatch(app.mount());

    loop {
        for completion in dispatcher.drain() {
            app.on_completion(completion);
        }

        terminal.draw(|frame| render(frame, app))?;

        if event::poll(TICK_RATE)? {
            if let Event::Key(key) = event::read()? {
                if key.kind == KeyEventKind::Press {
                    if let Some(message) = map_key_event(key) {
                        if let Some(request) = app.handle(message) {
                            dispatcher.dispatch(request);
                        }
                    }
                }
            }
        }

        if app.should_quit {
            break;
        }
    }

    Ok(())
}

fn render(frame: &mut Frame<'_>, app: &BrowserApp) {
    let error = app.engine.error();
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(3),
            Constraint::Length(3),
            Constraint::Length(if error.is_some() { 3 } else { 0 }),
            Constraint::Min(6),
            Constraint::Length(5),
        ])
        .split(frame.area());

    let phase = match app.engine.phase() {
        EnginePhase::Idle => "idle",
        EnginePhase::Loading => "loading",
        EnginePhase::Loaded => "loaded",
        EnginePhase::Failed => "failed",
    };
    let header = Paragraph::new(Line::from(vec![
        Span::styled(
            format!(" {TITLE} "),
            Style::default()
                .fg(Color::Yellow)
                .add_modifier(Modifier::BOLD),
        ),
        Span::raw(" | "),
        Span::raw(format!("Data: {phase}")),
        Span::raw(" | "),
        Span::raw(format!(
            "Showing {} of {} loaded rows",
            app.engine.rows().len(),
            app.engine.window().len()
        )),
    ]))
    .block(Block::default().borders(Borders::ALL).title("Carrier registry"));
    frame.render_widget(header, chunks[0]);

    render_filter_bar(frame, app, chunks[1]);

    if let Some(message) = error {
        let banner = Paragraph::new(Line::from(Span::styled(
            message,
            Style::default().fg(Color::Red).add_modifier(Modifier::BOLD),
        )))
        .block(Block::default().borders(Borders::ALL).title("Error"));
        frame.render_widget(banner, chunks[2]);
    }

    render_table(frame, app, chunks[3]);

    let footer = Paragraph::new(vec![
        Line::from(app.page_summary()),
        Line::from(
            "Tab: column | type: filter | Ctrl+S: sort | PgUp/PgDn: page | Ctrl+N: rows/page | F1: help",
        ),
        Line::from(format!("Status: {}", app.status_line)),
    ])
    .block(Block::default().borders(Borders::ALL).title("Pagination"));
    frame.render_widget(footer, chunks[4]);

    if app.show_help {
        render_help_popup(frame);
    }
}

fn render_filter_bar(frame: &mut Frame<'_>, app: &BrowserApp, area: Rect) {
    let mut spans = vec![
        Span::styled(
            format!("{}: ", app.focused.label()),
            Style::default()
                .fg(Color::Cyan)
                .add_modifier(Modifier::BOLD),
        ),
        Span::raw(format!(
            "{}_",
            app.engine.filters().pattern(app.focused)
        )),
    ];

    let others = app
        .engine
        .filters()
        .active()
        .filter(|(field, _)| *field != app.focused)
        .map(|(field, pattern)| format!("{}~{pattern}", field.identifier()))
        .collect::<Vec<_>>();
    if !others.is_empty() {
        spans.push(Span::raw("   also: "));
        spans.push(Span::raw(others.join(", ")));
    }

    let bar = Paragraph::new(Line::from(spans))
        .block(Block::default().borders(Borders::ALL).title("Filter"));
    frame.render_widget(bar, area);
}

fn render_table(frame: &mut Frame<'_>, app: &BrowserApp, area: Rect) {
    let sort = app.engine.sort();
    let header = Row::new(Field::ALL.iter().map(|field| {
        let title = match sort.direction_for(*field) {
            Some(direction) => format!("{} {}", field.label(), direction.arrow()),
            None => field.label().to_string(),
        };
        let style = if *field == app.focused {
            Style::default()
                .fg(Color::Yellow)
                .add_modifier(Modifier::BOLD)
        } else {
            Style::default().add_modifier(Modifier::BOLD)
        };
        Cell::from(title).style(style)
    }));

    let visible = app.engine.rows();
    let body = if app.engine.is_loading() {
        Vec::new()
    } else {
        visible
            .iter()
            .map(|row| {
                Row::new(
                    row.fields()
                        .map(|(field, value)| Cell::from(display_value(field, value).into_owned())),
                )
            })
            .collect::<Vec<_>>()
    };
    let is_empty = body.is_empty();

    let table = Table::new(body, Field::ALL.iter().map(|_| Constraint::Fill(1)))
        .header(header)
        .block(Block::default().borders(Borders::ALL).title("Records"))
        .row_highlight_style(Style::default().add_modifier(Modifier::REVERSED));

    let mut state = TableState::default();
    if !is_empty {
        state.select(Some(app.cursor));
    }
    frame.render_stateful_widget(table, area, &mut state);

    if is_empty {
        let message = if app.engine.is_loading() {
            "Loading data..."
        } else {
            "No data available"
        };
        let placeholder = Rect {
            x: area.x.saturating_add(1),
            y: area.y.saturating_add(2),
            width: area.width.saturating_sub(2),
            height: area.height.saturating_sub(3).min(1),
        };
        frame.render_widget(
            Paragraph::new(message).alignment(Alignment::Center),
            placeholder,
        );
    }
}

fn render_help_popup(frame: &mut Frame<'_>) {
    let area = centered_rect(70, 60, frame.area());
    frame.render_widget(Clear, area);
    let help = Paragraph::new(vec![
        Line::from("Keymap"),
        Line::from("Esc / Ctrl+C: quit"),
        Line::from("F1: toggle help"),
        Line::from("Tab / Shift+Tab: focus next / previous column"),
        Line::from("Type / Backspace: edit the focused column's filter"),
        Line::from("Ctrl+U: clear focused filter, Ctrl+L: clear all filters"),
        Line::from("Ctrl+S: sort by focused column (asc, then desc), Ctrl+X: clear sort"),
        Line::from("PgDn / PgUp / Home: next / previous / first page"),
        Line::from("Ctrl+N: cycle rows per page, Ctrl+R: reload page"),
        Line::from("Up / Down: move row cursor"),
    ])
    .block(Block::default().borders(Borders::ALL).title("Help"));
    frame.render_widget(help, area);
}

fn centered_rect(width_percent: u16, height_percent: u16, area: Rect) -> Rect {
    let vertical = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Percentage((100_u16 - height_percent) / 2),
            Constraint::Percentage(height_percent),
            Constraint::Percentage((100_u16 - height_percent) / 2),
        ])
        .split(area);

    Layout::default()
        .direction(Direction::Horizontal)
        .constraints([
            Constraint::Percentage((100_u16 - width_percent) / 2),
            Constraint::Percentage(width_percent),
            Constraint::Percentage((100_u16 - width_percent) / 2),
        ])
        .split(vertical[1])[1]
}

fn map_key_event(key: KeyEvent) -> Option<Msg> {
    match (key.modifiers, key.code) {
        (KeyModifiers::CONTROL, KeyCode::Char('c')) | (_, KeyCode::Esc) => Some(Msg::Quit),
        (KeyModifiers::CONTROL, KeyCode::Char('s')) => Some(Msg::ToggleSort),
        (KeyModifiers::CONTROL, KeyCode::Char('x')) => Some(Msg::ClearSort),
        (KeyModifiers::CONTROL, KeyCode::Char('u')) => Some(Msg::ClearFocusedFilter),
        (KeyModifiers::CONTROL, KeyCode::Char('l')) => Some(Msg::ClearFilters),
        (KeyModifiers::CONTROL, KeyCode::Char('r')) => Some(Msg::Reload),
        (KeyModifiers::CONTROL, KeyCode::Char('n')) => Some(Msg::CyclePageSize),
        (_, KeyCode::F(1)) => Some(Msg::ToggleHelp),
        (_, KeyCode::Tab) => Some(Msg::FocusNext),
        (_, KeyCode::BackTab) => Some(Msg::FocusPrevious),
        (_, KeyCode::PageDown) => Some(Msg::NextPage),
        (_, KeyCode::PageUp) => Some(Msg::PreviousPage),
        (_, KeyCode::Home) => Some(Msg::FirstPage),
        (_, KeyCode::Up) => Some(Msg::CursorUp),
        (_, KeyCode::Down) => Some(Msg::CursorDown),
        (_, KeyCode::Backspace) => Some(Msg::Erase),
        (KeyModifiers::NONE | KeyModifiers::SHIFT, KeyCode::Char(ch)) => Some(Msg::Type(ch)),
        _ => None,
    }
}
