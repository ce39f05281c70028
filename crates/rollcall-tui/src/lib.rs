// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

use anyhow::{Context, Result, anyhow};
use crossterm::event::{self, Event, KeyCode, KeyEvent, KeyModifiers};
use crossterm::terminal::{disable_raw_mode, enable_raw_mode};
use crossterm::{execute, terminal};
use ratatui::Terminal;
use ratatui::backend::CrosstermBackend;
use ratatui::layout::{Constraint, Direction, Layout, Rect};
use ratatui::style::{Color, Modifier, Style};
use ratatui::widgets::{Block, Borders, Cell, Clear, Paragraph, Row, Table, Tabs, Wrap};
use rollcall_app::{
    Completion, ConnectionStatus, ConsoleCommand, ConsoleEvent, ConsoleState, DELETE_PROMPT,
    FormField, GatewayOp, Outcome, ParticipantForm, ParticipantId, ParticipantStatus,
    PendingMutation, RECENT_COLUMNS, RECORD_COLUMNS, RenderedRow, Request, TRANSACTION_COLUMNS,
    ViewKind, record_rows, recent_rows, transaction_rows,
};
use std::io;
use std::sync::mpsc::{self, Receiver, Sender};
use std::time::Duration;
use tracing::{debug, warn};

const POLL_INTERVAL: Duration = Duration::from_millis(120);

/// Performs gateway calls on behalf of the console loop.
///
/// `spawn_request` must eventually send exactly one
/// [`InternalEvent::Completed`] per request. The default runs the call inline.
pub trait AppRuntime {
    fn perform(&mut self, op: &GatewayOp) -> Outcome;

    fn spawn_request(&mut self, request: Request, tx: Sender<InternalEvent>) -> Result<()> {
        let outcome = self.perform(&request.op);
        tx.send(InternalEvent::Completed(Completion::new(request, outcome)))
            .map_err(|_| anyhow!("completion channel closed"))?;
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InternalEvent {
    Completed(Completion),
}

/// Which text input, if any, owns typed characters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
enum Focus {
    #[default]
    Table,
    DashboardSearch,
    RecordSearch,
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
struct ViewData {
    focus: Focus,
    recent_cursor: usize,
    records_cursor: usize,
    form_field: usize,
}

impl ViewData {
    fn form_field(&self) -> FormField {
        FormField::ALL[self.form_field.min(FormField::ALL.len() - 1)]
    }
}

pub fn run_app<R: AppRuntime>(state: &mut ConsoleState, runtime: &mut R) -> Result<()> {
    enable_raw_mode().context("enable raw mode")?;
    let mut stdout = io::stdout();
    execute!(stdout, terminal::EnterAlternateScreen).context("enter alternate screen")?;

    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend).context("create terminal")?;

    let mut view_data = ViewData::default();
    let (internal_tx, internal_rx) = mpsc::channel();

    dispatch(
        state,
        runtime,
        &mut view_data,
        &internal_tx,
        ConsoleCommand::Startup,
    );

    let mut result = Ok(());
    loop {
        process_internal_events(state, runtime, &mut view_data, &internal_tx, &internal_rx);

        if let Err(error) = terminal.draw(|frame| render(frame, state, &view_data)) {
            result = Err(error).context("draw frame");
            break;
        }

        let has_event = event::poll(POLL_INTERVAL).context("poll event")?;
        if has_event {
            match event::read().context("read event")? {
                Event::Key(key) => {
                    if handle_key_event(state, runtime, &mut view_data, &internal_tx, key) {
                        break;
                    }
                }
                Event::Resize(_, _) => {}
                _ => {}
            }
        }
    }

    disable_raw_mode().context("disable raw mode")?;
    execute!(io::stdout(), terminal::LeaveAlternateScreen).context("leave alternate screen")?;
    result
}

fn process_internal_events<R: AppRuntime>(
    state: &mut ConsoleState,
    runtime: &mut R,
    view_data: &mut ViewData,
    tx: &Sender<InternalEvent>,
    rx: &Receiver<InternalEvent>,
) {
    while let Ok(event) = rx.try_recv() {
        match event {
            InternalEvent::Completed(completion) => {
                dispatch(
                    state,
                    runtime,
                    view_data,
                    tx,
                    ConsoleCommand::Complete(completion),
                );
            }
        }
    }
}

/// Applies a command and hands every issued request to the runtime.
fn dispatch<R: AppRuntime>(
    state: &mut ConsoleState,
    runtime: &mut R,
    view_data: &mut ViewData,
    tx: &Sender<InternalEvent>,
    command: ConsoleCommand,
) {
    let mut queue = vec![command];
    while let Some(command) = queue.pop() {
        for event in state.dispatch(command) {
            match event {
                ConsoleEvent::Issue(request) => {
                    debug!(op = request.op.name(), "spawning request");
                    let fallback = request.clone();
                    if let Err(error) = runtime.spawn_request(request, tx.clone()) {
                        warn!(error = %error, "request could not be started");
                        queue.push(ConsoleCommand::Complete(Completion::new(
                            fallback,
                            Outcome::Failed(format!("{error:#}")),
                        )));
                    }
                }
                ConsoleEvent::ViewChanged(_) => view_data.focus = Focus::Table,
                ConsoleEvent::FormOpened(_) => view_data.form_field = 0,
                _ => {}
            }
        }
    }
    clamp_cursors(state, view_data);
}

fn clamp_cursors(state: &ConsoleState, view_data: &mut ViewData) {
    let recent = recent_rows(&state.recent).len();
    let records = record_rows(&state.records).len();
    view_data.recent_cursor = view_data.recent_cursor.min(recent.saturating_sub(1));
    view_data.records_cursor = view_data.records_cursor.min(records.saturating_sub(1));
}

fn handle_key_event<R: AppRuntime>(
    state: &mut ConsoleState,
    runtime: &mut R,
    view_data: &mut ViewData,
    tx: &Sender<InternalEvent>,
    key: KeyEvent,
) -> bool {
    if key.modifiers.contains(KeyModifiers::CONTROL)
        && matches!(key.code, KeyCode::Char('q') | KeyCode::Char('c'))
    {
        return true;
    }

    let command = if state.alert.is_some() {
        alert_command(key)
    } else if state.confirm_delete.is_some() {
        confirm_command(key)
    } else if let Some(form) = &state.form {
        form_command(form, view_data, key)
    } else if view_data.focus != Focus::Table {
        input_command(state, view_data, key)
    } else {
        nav_command(state, view_data, key)
    };

    if let Some(command) = command {
        dispatch(state, runtime, view_data, tx, command);
    }
    false
}

fn alert_command(key: KeyEvent) -> Option<ConsoleCommand> {
    matches!(key.code, KeyCode::Enter | KeyCode::Esc | KeyCode::Char(' '))
        .then_some(ConsoleCommand::DismissAlert)
}

fn confirm_command(key: KeyEvent) -> Option<ConsoleCommand> {
    match key.code {
        KeyCode::Char('y') | KeyCode::Char('Y') => Some(ConsoleCommand::ConfirmDelete),
        KeyCode::Char('n') | KeyCode::Char('N') | KeyCode::Esc => {
            Some(ConsoleCommand::DeclineDelete)
        }
        _ => None,
    }
}

fn form_command(
    form: &ParticipantForm,
    view_data: &mut ViewData,
    key: KeyEvent,
) -> Option<ConsoleCommand> {
    let field = view_data.form_field();
    match key.code {
        KeyCode::Esc => Some(ConsoleCommand::CancelForm),
        KeyCode::Enter => Some(ConsoleCommand::SubmitForm),
        KeyCode::Char('s') if key.modifiers.contains(KeyModifiers::CONTROL) => {
            Some(ConsoleCommand::SubmitForm)
        }
        KeyCode::Tab | KeyCode::Down => {
            view_data.form_field = (view_data.form_field + 1) % FormField::ALL.len();
            None
        }
        KeyCode::BackTab | KeyCode::Up => {
            view_data.form_field =
                (view_data.form_field + FormField::ALL.len() - 1) % FormField::ALL.len();
            None
        }
        KeyCode::Left | KeyCode::Right | KeyCode::Char(' ') if field == FormField::Status => {
            Some(ConsoleCommand::ToggleFormStatus)
        }
        KeyCode::Char(ch) if field != FormField::Status => {
            let mut text = form.text(field);
            text.push(ch);
            Some(ConsoleCommand::EditFormField(field, text))
        }
        KeyCode::Backspace if field != FormField::Status => {
            let mut text = form.text(field);
            text.pop();
            Some(ConsoleCommand::EditFormField(field, text))
        }
        _ => None,
    }
}

fn input_command(
    state: &ConsoleState,
    view_data: &mut ViewData,
    key: KeyEvent,
) -> Option<ConsoleCommand> {
    let dashboard = view_data.focus == Focus::DashboardSearch;
    let mut text = if dashboard {
        state.dashboard_search.clone()
    } else {
        state.filter.search.clone()
    };
    let set = |text: String| {
        if dashboard {
            ConsoleCommand::SetDashboardSearch(text)
        } else {
            ConsoleCommand::SetSearchText(text)
        }
    };

    match key.code {
        KeyCode::Esc => {
            view_data.focus = Focus::Table;
            None
        }
        KeyCode::Enter => {
            view_data.focus = Focus::Table;
            Some(if dashboard {
                ConsoleCommand::RunDashboardSearch
            } else {
                ConsoleCommand::ApplyFilters
            })
        }
        KeyCode::Backspace => {
            text.pop();
            Some(set(text))
        }
        KeyCode::Char(ch) => {
            text.push(ch);
            Some(set(text))
        }
        _ => None,
    }
}

fn nav_command(
    state: &ConsoleState,
    view_data: &mut ViewData,
    key: KeyEvent,
) -> Option<ConsoleCommand> {
    match key.code {
        KeyCode::Tab => Some(ConsoleCommand::NextView),
        KeyCode::BackTab => Some(ConsoleCommand::PrevView),
        KeyCode::Char('1') => Some(ConsoleCommand::ActivateView(ViewKind::Dashboard)),
        KeyCode::Char('2') => Some(ConsoleCommand::ActivateView(ViewKind::Records)),
        KeyCode::Char('3') | KeyCode::Char('?') => {
            Some(ConsoleCommand::ActivateView(ViewKind::Help))
        }
        KeyCode::Char('/') => {
            view_data.focus = match state.active_view {
                ViewKind::Dashboard => Focus::DashboardSearch,
                ViewKind::Records => Focus::RecordSearch,
                ViewKind::Help => return None,
            };
            None
        }
        KeyCode::Char('j') | KeyCode::Down => {
            move_cursor(state, view_data, 1);
            None
        }
        KeyCode::Char('k') | KeyCode::Up => {
            move_cursor(state, view_data, -1);
            None
        }
        KeyCode::Enter | KeyCode::Char('v') => {
            cursor_row_id(state, view_data).map(ConsoleCommand::Select)
        }
        KeyCode::Esc => Some(ConsoleCommand::ClearSelection),
        KeyCode::Char('d') if state.active_view == ViewKind::Records => Some(
            ConsoleCommand::SetDepartment(next_department(
                &state.filter.department,
                &state.departments,
            )),
        ),
        KeyCode::Char('a') => Some(ConsoleCommand::OpenAddForm),
        KeyCode::Char('e') => Some(ConsoleCommand::OpenEditForm),
        KeyCode::Char('x') => Some(ConsoleCommand::Archive),
        KeyCode::Char('D') => Some(ConsoleCommand::RequestDelete),
        KeyCode::Char('r') => Some(ConsoleCommand::Reload),
        _ => None,
    }
}

fn active_rows(state: &ConsoleState) -> Vec<RenderedRow> {
    match state.active_view {
        ViewKind::Dashboard => recent_rows(&state.recent),
        ViewKind::Records => record_rows(&state.records),
        ViewKind::Help => Vec::new(),
    }
}

fn active_cursor<'a>(
    state: &ConsoleState,
    view_data: &'a mut ViewData,
) -> Option<&'a mut usize> {
    match state.active_view {
        ViewKind::Dashboard => Some(&mut view_data.recent_cursor),
        ViewKind::Records => Some(&mut view_data.records_cursor),
        ViewKind::Help => None,
    }
}

fn move_cursor(state: &ConsoleState, view_data: &mut ViewData, delta: isize) {
    let len = active_rows(state).len();
    let Some(cursor) = active_cursor(state, view_data) else {
        return;
    };
    let next = cursor.saturating_add_signed(delta);
    *cursor = next.min(len.saturating_sub(1));
}

fn cursor_row_id(state: &ConsoleState, view_data: &ViewData) -> Option<ParticipantId> {
    let cursor = match state.active_view {
        ViewKind::Dashboard => view_data.recent_cursor,
        ViewKind::Records => view_data.records_cursor,
        ViewKind::Help => return None,
    };
    active_rows(state).get(cursor)?.id().cloned()
}

/// Cycles "all departments" then each known department in order.
fn next_department(current: &str, departments: &[String]) -> String {
    if departments.is_empty() {
        return String::new();
    }
    match departments.iter().position(|name| name == current) {
        None if current.is_empty() => departments[0].clone(),
        Some(index) if index + 1 < departments.len() => departments[index + 1].clone(),
        _ => String::new(),
    }
}

fn render(frame: &mut ratatui::Frame<'_>, state: &ConsoleState, view_data: &ViewData) {
    let layout = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(3),
            Constraint::Min(1),
            Constraint::Length(3),
        ])
        .split(frame.area());

    let selected = ViewKind::ALL
        .iter()
        .position(|view| *view == state.active_view)
        .unwrap_or(0);
    let titles = ViewKind::ALL
        .iter()
        .map(|view| view.label().to_owned())
        .collect::<Vec<String>>();
    let tabs = Tabs::new(titles)
        .block(Block::default().title("rollcall").borders(Borders::ALL))
        .style(Style::default().fg(Color::White))
        .highlight_style(
            Style::default()
                .fg(Color::Cyan)
                .add_modifier(Modifier::BOLD),
        )
        .select(selected);
    frame.render_widget(tabs, layout[0]);

    match state.active_view {
        ViewKind::Dashboard => render_dashboard(frame, layout[1], state, view_data),
        ViewKind::Records => render_records(frame, layout[1], state, view_data),
        ViewKind::Help => {
            let help = Paragraph::new(help_text())
                .block(Block::default().title("help").borders(Borders::ALL));
            frame.render_widget(help, layout[1]);
        }
    }

    let status = Paragraph::new(status_text(state, view_data))
        .style(Style::default().fg(connection_color(state.connection)))
        .block(Block::default().borders(Borders::ALL));
    frame.render_widget(status, layout[2]);

    if let Some(form) = &state.form {
        let area = centered_rect(60, 50, frame.area());
        frame.render_widget(Clear, area);
        let modal = Paragraph::new(form_text(form, view_data.form_field())).block(
            Block::default()
                .title(form.mode.title())
                .borders(Borders::ALL)
                .style(Style::default().fg(Color::Cyan)),
        );
        frame.render_widget(modal, area);
    }

    if state.confirm_delete.is_some() {
        let area = centered_rect(50, 20, frame.area());
        frame.render_widget(Clear, area);
        let prompt = Paragraph::new(format!("{DELETE_PROMPT}\n\ny confirm | n cancel")).block(
            Block::default()
                .title("delete")
                .borders(Borders::ALL)
                .style(Style::default().fg(Color::Red)),
        );
        frame.render_widget(prompt, area);
    }

    if let Some(alert) = &state.alert {
        let area = centered_rect(60, 20, frame.area());
        frame.render_widget(Clear, area);
        let message = Paragraph::new(format!("{alert}\n\nenter dismiss")).block(
            Block::default()
                .title("alert")
                .borders(Borders::ALL)
                .style(Style::default().fg(Color::Yellow)),
        );
        frame.render_widget(message, area);
    }
}

fn render_dashboard(
    frame: &mut ratatui::Frame<'_>,
    area: Rect,
    state: &ConsoleState,
    view_data: &ViewData,
) {
    let layout = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(3),
            Constraint::Length(7),
            Constraint::Min(5),
        ])
        .split(area);

    let search = Paragraph::new(input_line(
        &state.dashboard_search,
        view_data.focus == Focus::DashboardSearch,
    ))
    .block(Block::default().title("search").borders(Borders::ALL));
    frame.render_widget(search, layout[0]);

    render_rows(
        frame,
        layout[1],
        "recently updated",
        &RECENT_COLUMNS,
        &recent_rows(&state.recent),
        Some(view_data.recent_cursor),
        state.selection.as_ref(),
    );
    render_transactions(frame, layout[2], state);
}

fn render_records(
    frame: &mut ratatui::Frame<'_>,
    area: Rect,
    state: &ConsoleState,
    view_data: &ViewData,
) {
    let layout = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(3),
            Constraint::Min(5),
            Constraint::Length(7),
        ])
        .split(area);

    let filters = Paragraph::new(filter_text(state, view_data))
        .block(Block::default().title("filters").borders(Borders::ALL));
    frame.render_widget(filters, layout[0]);

    render_rows(
        frame,
        layout[1],
        "records",
        &RECORD_COLUMNS,
        &record_rows(&state.records),
        Some(view_data.records_cursor),
        state.selection.as_ref(),
    );
    render_transactions(frame, layout[2], state);
}

fn render_transactions(frame: &mut ratatui::Frame<'_>, area: Rect, state: &ConsoleState) {
    render_rows(
        frame,
        area,
        "transactions",
        &TRANSACTION_COLUMNS,
        &transaction_rows(&state.transactions),
        None,
        None,
    );
}

fn render_rows(
    frame: &mut ratatui::Frame<'_>,
    area: Rect,
    title: &str,
    columns: &[&str],
    rows: &[RenderedRow],
    cursor: Option<usize>,
    selection: Option<&ParticipantId>,
) {
    let widths = vec![Constraint::Min(6); columns.len().max(1)];
    let header = Row::new(columns.iter().map(|label| {
        Cell::from(*label).style(
            Style::default()
                .fg(Color::White)
                .add_modifier(Modifier::BOLD),
        )
    }));

    let block = Block::default().title(title.to_owned()).borders(Borders::ALL);
    if let Some(text) = spanning_text(rows) {
        let inner = block.inner(area);
        frame.render_widget(block, area);
        frame.render_widget(Table::new(Vec::<Row>::new(), widths).header(header), inner);
        let body = Rect {
            y: inner.y.saturating_add(1),
            height: inner.height.saturating_sub(1),
            ..inner
        };
        let message = Paragraph::new(text.to_owned())
            .style(Style::default().fg(Color::Gray))
            .wrap(Wrap { trim: true });
        frame.render_widget(message, body);
        return;
    }

    let body = rows.iter().enumerate().map(|(index, row)| {
        let mut style = Style::default();
        if row.id().is_some() && row.id() == selection {
            style = style.fg(Color::Cyan).add_modifier(Modifier::BOLD);
        }
        if cursor == Some(index) {
            style = style.bg(Color::DarkGray);
        }
        Row::new(row.cells().into_iter().map(Cell::from)).style(style)
    });

    let table = Table::new(body, widths)
        .header(header)
        .column_spacing(1)
        .block(block);
    frame.render_widget(table, area);
}

/// Placeholder and error rows stand alone and span the whole table body.
fn spanning_text(rows: &[RenderedRow]) -> Option<&str> {
    match rows {
        [RenderedRow::Spanning { text, .. }] => Some(text.as_str()),
        _ => None,
    }
}

fn input_line(text: &str, focused: bool) -> String {
    if focused {
        format!("{text}_")
    } else if text.is_empty() {
        "/ to search by name or employer".to_owned()
    } else {
        text.to_owned()
    }
}

fn filter_text(state: &ConsoleState, view_data: &ViewData) -> String {
    let department = if state.filter.department.is_empty() {
        "All Departments"
    } else {
        state.filter.department.as_str()
    };
    format!(
        "search: {} | department: {department} (d)",
        input_line(&state.filter.search, view_data.focus == Focus::RecordSearch)
    )
}

fn form_text(form: &ParticipantForm, active: FormField) -> String {
    let mut lines = FormField::ALL
        .iter()
        .map(|field| {
            let marker = if *field == active { ">" } else { " " };
            let value = match field {
                FormField::Status => ParticipantStatus::ALL
                    .iter()
                    .map(|status| {
                        if *status == form.status {
                            format!("[{}]", status.as_str())
                        } else {
                            status.as_str().to_owned()
                        }
                    })
                    .collect::<Vec<_>>()
                    .join(" "),
                _ => form.text(*field),
            };
            format!("{marker} {}: {value}", field.label())
        })
        .collect::<Vec<_>>();

    lines.push(String::new());
    if let Some(error) = &form.error {
        lines.push(format!("! {error}"));
    }
    if form.submitting {
        lines.push("saving...".to_owned());
    } else {
        lines.push("enter save | esc cancel | tab field | space status".to_owned());
    }
    lines.join("\n")
}

fn status_text(state: &ConsoleState, view_data: &ViewData) -> String {
    let mut parts = vec![state.connection.label().to_owned()];
    match &state.selection {
        Some(id) => parts.push(format!("selected {id}")),
        None => parts.push("no selection".to_owned()),
    }
    if let Some(pending) = &state.pending {
        parts.push(pending_label(pending).to_owned());
    }

    let hints = match (view_data.focus, state.selection_actions_enabled()) {
        (Focus::DashboardSearch | Focus::RecordSearch, _) => "type to search | enter run | esc",
        (Focus::Table, true) => {
            "j/k move | enter view | a add | e edit | x archive | D delete | esc"
        }
        (Focus::Table, false) => "j/k move | enter view | / search | a add | r reload | ctrl+q",
    };
    parts.push(hints.to_owned());
    parts.join(" | ")
}

fn pending_label(pending: &PendingMutation) -> &'static str {
    match pending {
        PendingMutation::Save { .. } => "saving...",
        PendingMutation::Archive(_) => "archiving...",
        PendingMutation::Delete { .. } => "deleting...",
    }
}

fn connection_color(status: ConnectionStatus) -> Color {
    match status {
        ConnectionStatus::Unknown => Color::Gray,
        ConnectionStatus::Connected => Color::Green,
        ConnectionStatus::Unreachable => Color::Red,
    }
}

fn help_text() -> &'static str {
    "global: ctrl+q quit | tab/shift+tab switch view | 1/2/3 jump to view | ? help\n\
tables: j/k move | enter or v view transactions | esc clear selection | r reload\n\
search: / edit search | enter run | esc leave input\n\
records: d cycle department\n\
edit: a add | e edit | x archive | D delete (y/n to confirm)\n\
form: tab/shift+tab field | space toggle status | enter save | esc cancel"
}

fn centered_rect(percent_x: u16, percent_y: u16, area: Rect) -> Rect {
    let popup_layout = Layout::default()
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
        .split(popup_layout[1])[1]
}
