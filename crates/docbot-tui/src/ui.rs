use docbot_core::gate::{self, View};
use docbot_core::Sender;
use ratatui::{
    layout::{Constraint, Layout, Rect},
    style::{Color, Modifier, Style, Stylize},
    text::{Line, Span, Text},
    widgets::{Block, Borders, List, ListItem, ListState, Paragraph, Wrap},
    Frame,
};

use crate::app::{App, InputMode, LoginField};

/// Ensure the selected item in a list is visible by adjusting the ListState offset.
fn ensure_selected_visible(state: &mut ListState, visible_height: usize) {
    let visible_height = visible_height.max(1);

    if let Some(selected) = state.selected() {
        let min_offset = selected.saturating_sub(visible_height - 1);
        let new_offset = state.offset().clamp(min_offset, selected);
        if new_offset != state.offset() {
            *state.offset_mut() = new_offset;
        }
    }
}

/// Render a single-line input, scrolled horizontally so the cursor stays visible.
fn render_line_input(
    frame: &mut Frame,
    area: Rect,
    block: Block,
    text: &str,
    cursor_pos: usize,
    show_cursor: bool,
) {
    let inner_width = area.width.saturating_sub(2) as usize;

    let scroll_offset = if inner_width == 0 {
        0
    } else if cursor_pos >= inner_width {
        cursor_pos - inner_width + 1
    } else {
        0
    };

    let visible_text: String = text.chars().skip(scroll_offset).take(inner_width).collect();
    let input = Paragraph::new(visible_text)
        .style(Style::default().fg(Color::Cyan))
        .block(block);
    frame.render_widget(input, area);

    if show_cursor {
        let cursor_x = (cursor_pos - scroll_offset) as u16;
        frame.set_cursor_position((area.x + cursor_x + 1, area.y + 1));
    }
}

fn centered(area: Rect, width: u16, height: u16) -> Rect {
    let [_, row, _] = Layout::vertical([
        Constraint::Fill(1),
        Constraint::Length(height),
        Constraint::Fill(1),
    ])
    .areas(area);
    let [_, cell, _] = Layout::horizontal([
        Constraint::Fill(1),
        Constraint::Length(width),
        Constraint::Fill(1),
    ])
    .areas(row);
    cell
}

pub fn render(app: &mut App, frame: &mut Frame) {
    let area = frame.area();

    // Main layout: header, body, footer
    let [header_area, body_area, footer_area] = Layout::vertical([
        Constraint::Length(1),
        Constraint::Min(0),
        Constraint::Length(1),
    ])
    .areas(area);

    render_header(app, frame, header_area);

    match app.screen {
        View::Login => render_login_screen(app, frame, body_area),
        View::Admin => render_admin_screen(app, frame, body_area),
        View::Chat => render_chat_screen(app, frame, body_area),
    }

    render_footer(app, frame, footer_area);
}

fn render_header(app: &App, frame: &mut Frame, area: Rect) {
    let session = app.session();

    let mut spans = vec![
        Span::styled(" Document Search Bot ", Style::default().fg(Color::Cyan).bold()),
        Span::styled(
            format!("v{} ", env!("CARGO_PKG_VERSION")),
            Style::default().fg(Color::DarkGray),
        ),
    ];

    let links = gate::nav_links(session.as_ref());
    for (i, view) in links.iter().enumerate() {
        let style = if *view == app.screen {
            Style::default().fg(Color::White).bold()
        } else {
            Style::default().fg(Color::Gray)
        };
        spans.push(Span::raw(" "));
        spans.push(Span::styled(format!("[{}] {}", i + 1, view.title()), style));
    }

    if let Some(session) = &session {
        spans.push(Span::styled(
            format!("  {} ", session.role().as_str()),
            Style::default().fg(Color::Yellow),
        ));
        spans.push(Span::styled("[L] Logout", Style::default().fg(Color::Gray)));
    }

    let header = Paragraph::new(Line::from(spans)).style(Style::default().bg(Color::DarkGray));
    frame.render_widget(header, area);
}

fn render_footer(app: &App, frame: &mut Frame, area: Rect) {
    let mode_style = match app.input_mode {
        InputMode::Normal => Style::default().bg(Color::Blue).fg(Color::White),
        InputMode::Editing => Style::default().bg(Color::Yellow).fg(Color::Black),
    };

    let mode_text = match app.screen {
        View::Login => " LOGIN ",
        View::Admin => " ADMIN ",
        View::Chat => " CHAT ",
    };

    // Key style: dark background with bright text for visibility on both light/dark terminals
    let key_style = Style::default().bg(Color::DarkGray).fg(Color::White);
    let label_style = Style::default().bg(Color::Black).fg(Color::White);

    let keys: &[(&str, &str)] = match (app.screen, app.input_mode) {
        (View::Login, _) => &[(" Tab ", " next field "), (" Enter ", " sign in "), (" Esc ", " quit ")],
        (View::Admin, InputMode::Normal) if app.documents.selected().is_some() => &[
            (" y ", " upload "),
            (" x ", " cancel "),
            (" u ", " choose another "),
            (" q ", " quit "),
        ],
        (View::Admin, InputMode::Normal) => &[
            (" j/k ", " nav "),
            (" u ", " choose file "),
            (" d ", " delete "),
            (" o ", " download "),
            (" r ", " refresh "),
            (" 2 ", " chat "),
            (" L ", " logout "),
            (" q ", " quit "),
        ],
        (View::Admin, InputMode::Editing) => &[(" Enter ", " select "), (" Esc ", " cancel ")],
        (View::Chat, InputMode::Normal) => &[
            (" i ", " type "),
            (" j/k ", " scroll "),
            (" L ", " logout "),
            (" q ", " quit "),
        ],
        (View::Chat, InputMode::Editing) => &[(" Enter ", " send "), (" Esc ", " normal mode ")],
    };

    let hints = keys
        .iter()
        .flat_map(|(key, label)| [Span::styled(*key, key_style), Span::styled(*label, label_style)]);

    let footer_content = Line::from(
        vec![Span::styled(mode_text, mode_style), Span::styled(" ", label_style)]
            .into_iter()
            .chain(hints)
            .collect::<Vec<_>>(),
    );

    let footer = Paragraph::new(footer_content).style(Style::default().bg(Color::Black));
    frame.render_widget(footer, area);
}

fn render_login_screen(app: &mut App, frame: &mut Frame, area: Rect) {
    let form_area = centered(area, 50, 11);

    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(Style::default().fg(Color::Cyan))
        .title(" Login ");
    let inner = block.inner(form_area);
    frame.render_widget(block, form_area);

    let [username_area, password_area, status_area] = Layout::vertical([
        Constraint::Length(3),
        Constraint::Length(3),
        Constraint::Min(1),
    ])
    .areas(inner);

    let field_block = |title: &'static str, focused: bool| {
        let color = if focused { Color::Yellow } else { Color::DarkGray };
        Block::default()
            .borders(Borders::ALL)
            .border_style(Style::default().fg(color))
            .title(title)
    };

    let on_username = app.login_field == LoginField::Username;
    let masked = "*".repeat(app.password.chars().count());
    render_line_input(
        frame,
        username_area,
        field_block(" Username ", on_username),
        &app.username,
        app.username.chars().count(),
        on_username && !app.is_logging_in(),
    );
    render_line_input(
        frame,
        password_area,
        field_block(" Password ", !on_username),
        &masked,
        app.password.chars().count(),
        !on_username && !app.is_logging_in(),
    );

    let status = if app.is_logging_in() {
        let dots = ".".repeat((app.animation_frame as usize) + 1);
        Line::from(Span::styled(
            format!("Signing in{}", dots),
            Style::default().fg(Color::DarkGray).add_modifier(Modifier::ITALIC),
        ))
    } else if let Some(error) = &app.login_error {
        Line::from(Span::styled(error.as_str(), Style::default().fg(Color::Red)))
    } else {
        Line::default()
    };
    frame.render_widget(Paragraph::new(status).wrap(Wrap { trim: true }), status_area);
}

fn render_admin_screen(app: &mut App, frame: &mut Frame, area: Rect) {
    let [upload_area, status_area, list_area] = Layout::vertical([
        Constraint::Length(4),
        Constraint::Length(1),
        Constraint::Min(0),
    ])
    .areas(area);

    render_upload_panel(app, frame, upload_area);

    // Workflow status, then local feedback such as selection errors
    let status = app.documents.status();
    let mut status_spans = vec![Span::raw(" ")];
    if let Some(message) = status.message() {
        let style = if status.is_busy() {
            Style::default().fg(Color::Yellow).add_modifier(Modifier::ITALIC)
        } else if status.is_error() {
            Style::default().fg(Color::Red)
        } else {
            Style::default().fg(Color::Green)
        };
        status_spans.push(Span::styled(message, style));
        status_spans.push(Span::raw("  "));
    }
    if let Some(notice) = &app.notice {
        status_spans.push(Span::styled(notice.clone(), Style::default().fg(Color::Gray)));
    }
    let status_line = Line::from(status_spans);
    frame.render_widget(Paragraph::new(status_line), status_area);

    let files = app.documents.files();
    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(Style::default().fg(Color::Cyan))
        .title(format!(" Managed Documents ({}) ", files.len()));

    if files.is_empty() {
        let empty = Paragraph::new(Span::styled(
            "No documents uploaded yet.",
            Style::default().fg(Color::DarkGray),
        ))
        .block(block);
        frame.render_widget(empty, list_area);
        return;
    }

    let items: Vec<ListItem> = files
        .iter()
        .map(|name| {
            if app.documents.is_uploading(name) {
                ListItem::new(Line::from(vec![
                    Span::raw(format!(" {} ", name)),
                    Span::styled("(uploading)", Style::default().fg(Color::DarkGray)),
                ]))
            } else {
                ListItem::new(format!(" {} ", name))
            }
        })
        .collect();

    let list = List::new(items)
        .block(block)
        .highlight_style(
            Style::default()
                .bg(Color::Cyan)
                .fg(Color::Black)
                .add_modifier(Modifier::BOLD),
        )
        .highlight_symbol("> ");

    let visible_height = list_area.height.saturating_sub(2) as usize;
    ensure_selected_visible(&mut app.files_state, visible_height);
    frame.render_stateful_widget(list, list_area, &mut app.files_state);
}

fn render_upload_panel(app: &App, frame: &mut Frame, area: Rect) {
    let [input_area, selected_area] = Layout::vertical([
        Constraint::Length(3),
        Constraint::Length(1),
    ])
    .areas(area);

    let editing = app.input_mode == InputMode::Editing;
    let border_color = if editing { Color::Yellow } else { Color::DarkGray };
    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(Style::default().fg(border_color))
        .title(" Upload (.pdf .doc .docx .xls .xlsx .ppt .pptx, max 2 MB) ");

    if editing || !app.path_input.is_empty() {
        render_line_input(frame, input_area, block, &app.path_input, app.path_cursor, editing);
    } else {
        let hint = Paragraph::new(Span::styled(
            "Press u to choose a file",
            Style::default().fg(Color::DarkGray),
        ))
        .block(block);
        frame.render_widget(hint, input_area);
    }

    let selected = match app.documents.selected() {
        Some(file) => Line::from(vec![
            Span::raw(" Selected: "),
            Span::styled(file.name.clone(), Style::default().fg(Color::Cyan).bold()),
            Span::styled(
                format!(" ({} KB)  y to upload, x to cancel", file.size().div_ceil(1024)),
                Style::default().fg(Color::DarkGray),
            ),
        ]),
        None => Line::default(),
    };
    frame.render_widget(Paragraph::new(selected), selected_area);
}

fn render_chat_screen(app: &mut App, frame: &mut Frame, area: Rect) {
    let [chat_area, input_area] = Layout::vertical([
        Constraint::Min(0),
        Constraint::Length(3),
    ])
    .areas(area);

    // Store chat area dimensions for scroll calculations (inner size minus borders)
    app.chat_height = chat_area.height.saturating_sub(2);
    app.chat_width = chat_area.width.saturating_sub(2);

    let chat_block = Block::default()
        .borders(Borders::ALL)
        .border_style(Style::default().fg(Color::Cyan))
        .title(" Chat ");

    let transcript = app.chat.transcript();
    let chat_text = if transcript.is_empty() && !app.chat.is_awaiting_reply() {
        Text::from(Span::styled(
            "Ask a question about your documents...",
            Style::default().fg(Color::DarkGray),
        ))
    } else {
        let mut lines: Vec<Line> = Vec::new();

        for msg in transcript {
            let color = match msg.sender {
                Sender::User => Color::Cyan,
                Sender::Bot => Color::Yellow,
            };
            lines.push(Line::from(Span::styled(
                format!("{}:", msg.sender.label()),
                Style::default().fg(color).add_modifier(Modifier::BOLD),
            )));
            for line in msg.text.lines() {
                lines.push(Line::from(line.to_string()));
            }
            lines.push(Line::default());
        }

        if app.chat.is_awaiting_reply() {
            lines.push(Line::from(Span::styled(
                format!("{}:", Sender::Bot.label()),
                Style::default().fg(Color::Yellow).add_modifier(Modifier::BOLD),
            )));
            // Animated ellipsis: cycles through ".", "..", "..."
            let dots = ".".repeat((app.animation_frame as usize) + 1);
            lines.push(Line::from(Span::styled(
                format!("Thinking{}", dots),
                Style::default().fg(Color::DarkGray).add_modifier(Modifier::ITALIC),
            )));
        }

        Text::from(lines)
    };

    let chat = Paragraph::new(chat_text)
        .block(chat_block)
        .wrap(Wrap { trim: true })
        .scroll((app.chat_scroll, 0));
    frame.render_widget(chat, chat_area);

    let editing = app.input_mode == InputMode::Editing;
    let input_block = Block::default()
        .borders(Borders::ALL)
        .border_style(Style::default().fg(if editing { Color::Yellow } else { Color::DarkGray }))
        .title(" Message ");
    render_line_input(frame, input_area, input_block, &app.chat.draft, app.chat_cursor, editing);
}
