use super::app::{App, HistoryEntry};
use super::helpers::{canvas_line, highlight_functions};
use crate::format::{format_number, format_with_spaces, wrap_text};
use crate::render_help::render_help;
use crate::session::{graph_caption, Reply};
use anyhow::Result;
use crossterm::event::{Event, KeyCode, KeyEvent, KeyEventKind, KeyModifiers, MouseEventKind};
use ratatui::{
    backend::CrosstermBackend,
    layout::{Alignment, Constraint, Direction, Layout, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, List, ListItem, ListState, Paragraph, Wrap},
    Frame, Terminal,
};
use std::time::Duration;
use unicode_width::UnicodeWidthStr;

const MIN_TERMINAL_WIDTH: u16 = 50;
const MIN_TERMINAL_HEIGHT: u16 = 10;

pub fn run_ui_loop(
    terminal: &mut Terminal<CrosstermBackend<std::io::Stdout>>,
    app: &mut App,
) -> Result<()> {
    loop {
        terminal.draw(|f| {
            if app.show_help {
                render_help(f, app);
            } else {
                ui(f, app);
            }
        })?;

        if app.should_quit {
            break;
        }

        if crossterm::event::poll(Duration::from_millis(50))? {
            match crossterm::event::read()? {
                Event::Key(KeyEvent { code, modifiers, kind, .. }) if kind == KeyEventKind::Press => {
                    handle_key_event(app, code, modifiers);
                }
                Event::Mouse(event) => {
                    handle_mouse_event(app, event);
                }
                _ => {}
            }
        }
    }
    Ok(())
}

fn handle_key_event(app: &mut App, code: KeyCode, modifiers: KeyModifiers) {
    if app.show_help {
        match code {
            KeyCode::Down => app.help_scroll = app.help_scroll.saturating_add(1),
            KeyCode::Up => app.help_scroll = app.help_scroll.saturating_sub(1),
            KeyCode::PageDown => app.help_scroll = app.help_scroll.saturating_add(10),
            KeyCode::PageUp => app.help_scroll = app.help_scroll.saturating_sub(10),
            KeyCode::Esc | KeyCode::F(1) => {
                app.show_help = false;
                app.help_scroll = 0;
            }
            _ => {}
        }
        return;
    }

    let ctrl = modifiers.contains(KeyModifiers::CONTROL);
    match code {
        KeyCode::Char('c') | KeyCode::Char('d') if ctrl => app.should_quit = true,
        KeyCode::Char('u') | KeyCode::Char('U') if ctrl => app.clear_input(),
        KeyCode::Char(c) if !ctrl => app.insert_char(c),
        KeyCode::Backspace => app.backspace(),
        KeyCode::Delete => app.delete(),
        KeyCode::Left if ctrl => app.move_cursor_by_words(-1),
        KeyCode::Right if ctrl => app.move_cursor_by_words(1),
        KeyCode::Left => app.move_cursor(-1),
        KeyCode::Right => app.move_cursor(1),
        KeyCode::Home => {
            app.cursor_position = 0;
            app.input_scroll = 0;
        }
        KeyCode::End => {
            app.cursor_position = app.input.chars().count();
        }
        KeyCode::Up => app.navigate_history(-1),
        KeyCode::Down => app.navigate_history(1),
        KeyCode::PageUp => app.scroll_history(-1),
        KeyCode::PageDown => app.scroll_history(1),
        KeyCode::Enter => app.submit(),
        KeyCode::F(1) => app.open_help(),
        KeyCode::Esc => app.cancel(),
        _ => {}
    }
}

fn handle_mouse_event(app: &mut App, event: crossterm::event::MouseEvent) {
    let scroll = if app.show_help {
        &mut app.help_scroll
    } else {
        &mut app.history_scroll
    };
    match event.kind {
        MouseEventKind::ScrollDown => *scroll = scroll.saturating_add(3),
        MouseEventKind::ScrollUp => *scroll = scroll.saturating_sub(3),
        _ => {}
    }
}

fn ui(frame: &mut Frame, app: &mut App) {
    let terminal_size = frame.size();

    app.terminal_too_small =
        terminal_size.width < MIN_TERMINAL_WIDTH || terminal_size.height < MIN_TERMINAL_HEIGHT;

    if app.terminal_too_small {
        render_resize_message(frame, terminal_size);
        return;
    }

    let layout = Layout::default()
        .direction(Direction::Vertical)
        .constraints(vec![
            Constraint::Length(3),
            Constraint::Length(1),
            Constraint::Min(3),
        ])
        .split(terminal_size);

    render_input(frame, app, layout[0]);
    render_status(frame, app, layout[1]);
    render_history(frame, app, layout[2]);
    app.list_height = layout[2].height as usize;
}

fn render_resize_message(frame: &mut Frame, area: Rect) {
    let message = format!(
        "Terminal too small! Min size: {}x{}. Current: {}x{}",
        MIN_TERMINAL_WIDTH, MIN_TERMINAL_HEIGHT, area.width, area.height
    );

    let text = vec![
        Line::from(Span::styled(
            message,
            Style::default().fg(Color::Red).add_modifier(Modifier::BOLD),
        )),
        Line::from(""),
        Line::from(Span::styled(
            "Please resize your terminal window",
            Style::default().fg(Color::Yellow),
        )),
    ];

    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(Style::default().fg(Color::Red))
        .title(" Resize Required ")
        .title_alignment(Alignment::Center);

    let paragraph = Paragraph::new(text)
        .block(block)
        .alignment(Alignment::Center)
        .wrap(Wrap { trim: true });

    frame.render_widget(paragraph, area);
}

fn detail_lines(text: &str, wrap_width: usize, style: Style) -> Vec<ListItem<'static>> {
    wrap_text(text, wrap_width)
        .into_iter()
        .enumerate()
        .map(|(idx, line)| {
            let prefix = if idx == 0 { "    - " } else { "      " };
            ListItem::new(Line::from(Span::styled(format!("{}{}", prefix, line), style)))
        })
        .collect()
}

/// The list rows of one history entry.
fn entry_items(entry: &HistoryEntry, base_style: Style, wrap_width: usize) -> Vec<ListItem<'static>> {
    let mut items = Vec::new();

    if let Some(prompt) = &entry.prompt {
        items.push(ListItem::new(Line::from(Span::styled(
            format!("  {}", prompt.trim_end()),
            Style::default().fg(Color::DarkGray),
        ))));
    }

    let input = match &entry.reply {
        Reply::Value { label, .. } | Reply::Trace { label, .. } if entry.prompt.is_none() => {
            label.clone()
        }
        _ => format_with_spaces(&entry.input),
    };
    let input_lines = wrap_text(&input, wrap_width);
    let last = input_lines.len().saturating_sub(1);

    for (line_idx, line) in input_lines.into_iter().enumerate() {
        let marker = if line_idx == 0 { "> " } else { "  " };
        let mut spans = vec![Span::styled(marker, Style::default().fg(Color::Green))];
        spans.extend(highlight_functions(&line, base_style));

        if line_idx == last {
            match &entry.reply {
                Reply::Value { value, .. } | Reply::Trace { value, .. } => {
                    spans.push(Span::styled(" = ", Style::default().fg(Color::Gray)));
                    spans.push(Span::styled(
                        format_number(*value),
                        Style::default()
                            .fg(Color::LightMagenta)
                            .add_modifier(Modifier::BOLD),
                    ));
                }
                Reply::Error(e) => {
                    spans.push(Span::styled(" = ", Style::default().fg(Color::Gray)));
                    spans.push(Span::styled(
                        format!("Error: {}", e),
                        Style::default().fg(Color::Red).add_modifier(Modifier::BOLD),
                    ));
                }
                _ => {}
            }
        }
        items.push(ListItem::new(Line::from(spans)));
    }

    match &entry.reply {
        Reply::Value { label, .. } if entry.prompt.is_some() => {
            items.extend(detail_lines(label, wrap_width, Style::default().fg(Color::Cyan)));
        }
        Reply::Trace { steps, .. } => {
            for (j, step) in steps.iter().enumerate() {
                let text = format!(
                    "Step {}: {} = {}",
                    j + 1,
                    format_with_spaces(&step.operation),
                    format_number(step.result)
                );
                items.extend(detail_lines(&text, wrap_width, Style::default().fg(Color::DarkGray)));
            }
            let time = format!("Time: {:.6} ms", entry.duration.as_secs_f64() * 1000.0);
            items.extend(detail_lines(&time, wrap_width, Style::default().fg(Color::Magenta)));
        }
        Reply::Graph { source, canvas } => {
            items.push(ListItem::new(Line::from(Span::styled(
                format!("  {}", graph_caption(source, canvas)),
                Style::default().fg(Color::Cyan),
            ))));
            for row in 0..canvas.height() {
                items.push(ListItem::new(canvas_line(canvas, row)));
            }
        }
        Reply::Message(message) => {
            items.extend(detail_lines(message, wrap_width, Style::default().fg(Color::Yellow)));
        }
        _ => {}
    }

    items
}

fn render_history(frame: &mut Frame, app: &mut App, area: Rect) {
    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(Style::default().fg(Color::DarkGray))
        .title(" History ")
        .title_alignment(Alignment::Center);

    let inner_area = block.inner(area);
    frame.render_widget(block, area);

    if app.history.is_empty() {
        let empty_msg =
            Paragraph::new("No calculations yet. Enter an expression, or 'm' for the menu.")
                .style(Style::default().fg(Color::DarkGray))
                .alignment(Alignment::Center);
        frame.render_widget(empty_msg, inner_area);
        return;
    }

    let mut items = Vec::new();
    app.item_start_indices.clear();

    let wrap_width = inner_area.width.saturating_sub(4) as usize;

    for (i, entry) in app.history.iter().enumerate() {
        app.item_start_indices.push(items.len());

        let is_selected = i == app.cursor_history;
        let base_style = Style::default().fg(if is_selected { Color::Yellow } else { Color::Cyan });
        items.extend(entry_items(entry, base_style, wrap_width));

        // dialog steps stay together; only finished replies get a separator
        let finished = !matches!(entry.reply, Reply::Pending);
        if finished && i < app.history.len() - 1 {
            let separator = Span::styled(
                "-".repeat(inner_area.width as usize),
                Style::default().fg(Color::DarkGray),
            );
            items.push(ListItem::new(Line::from(separator)));
        }
    }

    if app.scroll_to_bottom {
        app.history_scroll = items.len().saturating_sub(inner_area.height as usize);
        app.scroll_to_bottom = false;
    }

    let selected_index = app.item_start_indices.get(app.cursor_history).copied();

    let list = List::new(items)
        .block(Block::default())
        .highlight_style(Style::default().bg(Color::DarkGray).add_modifier(Modifier::BOLD));

    let mut state = ListState::default()
        .with_selected(selected_index)
        .with_offset(app.history_scroll);

    frame.render_stateful_widget(list, inner_area, &mut state);
}

fn render_status(frame: &mut Frame, app: &App, area: Rect) {
    let keys: &[(&str, &str)] = if app.session.is_idle() {
        &[
            ("Enter", "Calculate"),
            ("Up/Down or PgUp/PgDn", "Navigate"),
            ("F1", "Menu"),
            ("Ctrl+U", "Clear Input"),
            ("Ctrl+C", "Quit"),
        ]
    } else {
        &[
            ("Enter", "Answer"),
            ("Empty Enter", "Default"),
            ("Esc", "Cancel"),
            ("F1", "Menu"),
        ]
    };

    let spans: Vec<Span> = keys
        .iter()
        .flat_map(|(key, desc)| {
            vec![
                Span::styled(
                    *key,
                    Style::default()
                        .fg(Color::Yellow)
                        .add_modifier(Modifier::BOLD),
                ),
                Span::styled(format!(" {} ", desc), Style::default().fg(Color::DarkGray)),
            ]
        })
        .collect();

    frame.render_widget(Paragraph::new(Line::from(spans)), area);
}

fn render_input(frame: &mut Frame, app: &mut App, area: Rect) {
    let title = format!(" {} ", app.session.prompt().trim_end());
    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(Style::default().fg(if app.session.is_idle() {
            Color::DarkGray
        } else {
            Color::Yellow
        }))
        .title(title)
        .title_alignment(Alignment::Center);

    let inner_area = block.inner(area);
    frame.render_widget(block, area);

    let visible_width = (inner_area.width.saturating_sub(2)) as usize;
    let total_chars = app.input.chars().count();
    app.adjust_input_scroll(visible_width);

    let visible_input: String = app
        .input
        .chars()
        .skip(app.input_scroll)
        .take(visible_width)
        .collect();

    let mut spans = vec![Span::raw("> ")];
    spans.extend(highlight_functions(&visible_input, Style::default()));
    frame.render_widget(Paragraph::new(Line::from(spans)), inner_area);

    let visible_cursor = app.cursor_position.saturating_sub(app.input_scroll);
    let visible_prefix = visible_input.chars().take(visible_cursor).collect::<String>();
    let cursor_x = inner_area.x + 2 + visible_prefix.width() as u16;
    let cursor_y = inner_area.y;
    frame.set_cursor(cursor_x, cursor_y);

    let scroll_indicator_style = Style::default().fg(Color::DarkGray);

    if app.input_scroll > 0 {
        let left_indicator = Paragraph::new("<").style(scroll_indicator_style);
        frame.render_widget(left_indicator, Rect::new(inner_area.x, inner_area.y, 1, 1));
    }

    if total_chars > app.input_scroll + visible_width {
        let right_indicator = Paragraph::new(">").style(scroll_indicator_style);
        frame.render_widget(
            right_indicator,
            Rect::new(inner_area.x + inner_area.width - 1, inner_area.y, 1, 1),
        );
    }
}
