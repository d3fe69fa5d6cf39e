use anyhow::Result;
use chrono::{Duration, NaiveDate};
use crossterm::{
    event::{self, Event, KeyCode, KeyEventKind, KeyModifiers},
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
};
use dairy_ledger::{
    calculate_billing_for, format_currency, format_date, grand_total, list_entries, BillingMonth,
    CustomerBill, Dashboard, EntryFilter, EntryView, Store,
};
use ratatui::{
    backend::CrosstermBackend,
    layout::{Constraint, Direction, Layout, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Cell, Paragraph, Row, Table, TableState},
    Frame, Terminal,
};
use std::io;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Page {
    Billing,
    Entries,
}

impl Page {
    pub fn next(&self) -> Self {
        match self {
            Page::Billing => Page::Entries,
            Page::Entries => Page::Billing,
        }
    }

    pub fn title(&self) -> &str {
        match self {
            Page::Billing => "Monthly Billing",
            Page::Entries => "Daily Entries",
        }
    }
}

/// Read-only viewer state for one billing month
pub struct App {
    store: Store,
    pub today: NaiveDate,
    pub month: BillingMonth,
    pub dashboard: Dashboard,
    pub bills: Vec<CustomerBill>,
    pub entries: Vec<EntryView>,
    pub current_page: Page,
    pub billing_state: TableState,
    pub entries_state: TableState,
    pub message: Option<String>,
}

impl App {
    pub fn new(store: Store, today: NaiveDate) -> dairy_ledger::Result<Self> {
        let month = BillingMonth::of(today);
        let dashboard = store.read(|conn| Dashboard::collect(conn, today))?;

        let mut app = Self {
            store,
            today,
            month,
            dashboard,
            bills: Vec::new(),
            entries: Vec::new(),
            current_page: Page::Billing,
            billing_state: TableState::default(),
            entries_state: TableState::default(),
            message: None,
        };
        app.reload()?;
        Ok(app)
    }

    /// Re-read the dashboard, the month's billing and its entries
    pub fn reload(&mut self) -> dairy_ledger::Result<()> {
        let month = self.month;
        let today = self.today;
        let last_day = month.next_month_first_day() - Duration::days(1);
        let filter = EntryFilter::between(month.first_day(), last_day);

        let (dashboard, bills, entries) = self.store.read(|conn| {
            Ok((
                Dashboard::collect(conn, today)?,
                calculate_billing_for(conn, &month)?,
                list_entries(conn, &filter)?,
            ))
        })?;

        self.dashboard = dashboard;
        self.bills = bills;
        self.entries = entries;
        self.billing_state
            .select(if self.bills.is_empty() { None } else { Some(0) });
        self.entries_state
            .select(if self.entries.is_empty() { None } else { Some(0) });
        self.message = None;
        Ok(())
    }

    pub fn next_month(&mut self) {
        self.month = self.month.next();
        self.reload_or_report();
    }

    pub fn previous_month(&mut self) {
        self.month = self.month.previous();
        self.reload_or_report();
    }

    fn reload_or_report(&mut self) {
        if let Err(err) = self.reload() {
            self.message = Some(err.to_string());
        }
    }

    pub fn next_page(&mut self) {
        self.current_page = self.current_page.next();
    }

    fn active(&mut self) -> (usize, &mut TableState) {
        match self.current_page {
            Page::Billing => (self.bills.len(), &mut self.billing_state),
            Page::Entries => (self.entries.len(), &mut self.entries_state),
        }
    }

    pub fn next(&mut self) {
        let (len, state) = self.active();
        if len == 0 {
            return;
        }
        let i = match state.selected() {
            Some(i) if i + 1 < len => i + 1,
            _ => 0,
        };
        state.select(Some(i));
    }

    pub fn previous(&mut self) {
        let (len, state) = self.active();
        if len == 0 {
            return;
        }
        let i = match state.selected() {
            Some(0) | None => len - 1,
            Some(i) => i - 1,
        };
        state.select(Some(i));
    }

    pub fn first(&mut self) {
        let (len, state) = self.active();
        if len > 0 {
            state.select(Some(0));
        }
    }

    pub fn last(&mut self) {
        let (len, state) = self.active();
        if len > 0 {
            state.select(Some(len - 1));
        }
    }
}

pub fn run_ui(app: &mut App) -> Result<()> {
    // Setup terminal
    enable_raw_mode()?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen)?;
    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend)?;

    let res = run_app(&mut terminal, app);

    // Restore terminal
    disable_raw_mode()?;
    execute!(terminal.backend_mut(), LeaveAlternateScreen)?;
    terminal.show_cursor()?;

    res.map_err(Into::into)
}

fn run_app<B: ratatui::backend::Backend>(
    terminal: &mut Terminal<B>,
    app: &mut App,
) -> io::Result<()> {
    loop {
        terminal.draw(|f| ui(f, app))?;

        if let Event::Key(key) = event::read()? {
            if key.kind != KeyEventKind::Press {
                continue;
            }
            match key.code {
                KeyCode::Char('q') | KeyCode::Esc => return Ok(()),
                KeyCode::Char('c') if key.modifiers.contains(KeyModifiers::CONTROL) => {
                    return Ok(())
                }
                KeyCode::Tab | KeyCode::BackTab => app.next_page(),
                KeyCode::Right | KeyCode::Char('l') => app.next_month(),
                KeyCode::Left | KeyCode::Char('h') => app.previous_month(),
                KeyCode::Char('r') => app.reload_or_report(),
                KeyCode::Down | KeyCode::Char('j') => app.next(),
                KeyCode::Up | KeyCode::Char('k') => app.previous(),
                KeyCode::Home => app.first(),
                KeyCode::End => app.last(),
                _ => {}
            }
        }
    }
}

fn ui(f: &mut Frame, app: &mut App) {
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(3), // Tabs and dashboard numbers
            Constraint::Min(0),
            Constraint::Length(3), // Status bar
        ])
        .split(f.size());

    render_header(f, chunks[0], app);
    match app.current_page {
        Page::Billing => render_billing(f, chunks[1], app),
        Page::Entries => render_entries(f, chunks[1], app),
    }
    render_status_bar(f, chunks[2], app);
}

fn render_header(f: &mut Frame, area: Rect, app: &App) {
    let mut spans = vec![];
    for (i, page) in [Page::Billing, Page::Entries].iter().enumerate() {
        if i > 0 {
            spans.push(Span::raw(" │ "));
        }
        let style = if *page == app.current_page {
            Style::default()
                .fg(Color::Yellow)
                .add_modifier(Modifier::BOLD | Modifier::UNDERLINED)
        } else {
            Style::default().fg(Color::DarkGray)
        };
        spans.push(Span::styled(page.title().to_string(), style));
    }

    let d = &app.dashboard;
    spans.push(Span::raw("  |  "));
    spans.push(Span::styled(
        format!("Customers: {}", d.total_customers),
        Style::default().fg(Color::White),
    ));
    spans.push(Span::raw("  "));
    spans.push(Span::styled(
        format!("Today ({}): {}", format_date(d.today), d.entries_today),
        Style::default().fg(Color::Green),
    ));
    spans.push(Span::raw("  "));
    spans.push(Span::styled(
        format!("Outstanding: {}", format_currency(d.outstanding)),
        Style::default().fg(Color::Red),
    ));

    let header = Paragraph::new(vec![Line::from(spans)]).block(
        Block::default()
            .borders(Borders::ALL)
            .border_style(Style::default().fg(Color::Cyan)),
    );
    f.render_widget(header, area);
}

fn header_row(titles: &[&'static str]) -> Row<'static> {
    let cells = titles.iter().map(|h| {
        Cell::from(*h).style(
            Style::default()
                .fg(Color::Yellow)
                .add_modifier(Modifier::BOLD),
        )
    });
    Row::new(cells)
        .style(Style::default().bg(Color::DarkGray))
        .height(1)
}

fn render_billing(f: &mut Frame, area: Rect, app: &mut App) {
    let rows = app.bills.iter().map(|bill| {
        Row::new(vec![
            Cell::from(truncate(&bill.customer_name, 30)),
            Cell::from(bill.entry_count.to_string()),
            Cell::from(format_currency(bill.total)).style(Style::default().fg(Color::Green)),
        ])
    });

    let title = format!(
        " Billing {}  ·  Total {} ",
        app.month,
        format_currency(grand_total(&app.bills))
    );
    let table = Table::new(
        rows,
        [
            Constraint::Length(32),
            Constraint::Length(10),
            Constraint::Length(14),
        ],
    )
    .header(header_row(&["Customer", "Entries", "Total"]))
    .block(
        Block::default()
            .borders(Borders::ALL)
            .border_style(Style::default().fg(Color::White))
            .title(title),
    )
    .highlight_style(
        Style::default()
            .bg(Color::DarkGray)
            .add_modifier(Modifier::BOLD),
    )
    .highlight_symbol("→ ");

    f.render_stateful_widget(table, area, &mut app.billing_state);
}

fn render_entries(f: &mut Frame, area: Rect, app: &mut App) {
    let rows = app.entries.iter().map(|e| {
        Row::new(vec![
            Cell::from(format_date(e.entry_date)),
            Cell::from(truncate(&e.customer_name, 24)),
            Cell::from(truncate(&e.product_name, 16)),
            Cell::from(e.quantity.to_string()),
            Cell::from(format_currency(e.amount())).style(Style::default().fg(Color::Green)),
        ])
    });

    let table = Table::new(
        rows,
        [
            Constraint::Length(12),
            Constraint::Length(26),
            Constraint::Length(18),
            Constraint::Length(10),
            Constraint::Length(12),
        ],
    )
    .header(header_row(&["Date", "Customer", "Product", "Quantity", "Amount"]))
    .block(
        Block::default()
            .borders(Borders::ALL)
            .border_style(Style::default().fg(Color::White))
            .title(format!(" Entries {} ", app.month)),
    )
    .highlight_style(
        Style::default()
            .bg(Color::DarkGray)
            .add_modifier(Modifier::BOLD),
    )
    .highlight_symbol("→ ");

    f.render_stateful_widget(table, area, &mut app.entries_state);
}

fn render_status_bar(f: &mut Frame, area: Rect, app: &App) {
    let (selected, total) = match app.current_page {
        Page::Billing => (app.billing_state.selected(), app.bills.len()),
        Page::Entries => (app.entries_state.selected(), app.entries.len()),
    };

    let mut spans = vec![Span::styled(
        format!(" Row: {}/{} ", selected.map(|i| i + 1).unwrap_or(0), total),
        Style::default().fg(Color::Cyan),
    )];

    if let Some(message) = &app.message {
        spans.push(Span::raw(" | "));
        spans.push(Span::styled(message.clone(), Style::default().fg(Color::Red)));
    }

    spans.push(Span::raw(" | "));
    spans.push(Span::styled("←/→", Style::default().fg(Color::Yellow)));
    spans.push(Span::raw(" Month | "));
    spans.push(Span::styled("Tab", Style::default().fg(Color::Yellow)));
    spans.push(Span::raw(" Page | "));
    spans.push(Span::styled("↑/↓", Style::default().fg(Color::Yellow)));
    spans.push(Span::raw(" Nav | "));
    spans.push(Span::styled("r", Style::default().fg(Color::Yellow)));
    spans.push(Span::raw(" Reload | "));
    spans.push(Span::styled("q", Style::default().fg(Color::Red)));
    spans.push(Span::raw(" Quit"));

    let status_bar = Paragraph::new(vec![Line::from(spans)]).block(
        Block::default()
            .borders(Borders::ALL)
            .border_style(Style::default().fg(Color::White)),
    );
    f.render_widget(status_bar, area);
}

fn truncate(s: &str, max_len: usize) -> String {
    if s.chars().count() <= max_len {
        s.to_string()
    } else {
        let kept: String = s.chars().take(max_len.saturating_sub(3)).collect();
        format!("{}...", kept)
    }
}
