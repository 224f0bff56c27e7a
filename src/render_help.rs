use crate::menu::{EXAMPLES, SECTIONS, TITLE};
use crate::tui_mode::app::App;
use ratatui::{
    layout::Alignment,
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, BorderType, Borders, Clear, Paragraph, Wrap},
    Frame,
};

const NAVIGATION: &[(&str, &str)] = &[
    ("← →", "Move cursor left/right"),
    ("Ctrl+←/→", "Move cursor by words"),
    ("Home/End", "Move to start/end of line"),
    ("↑ ↓", "Recall earlier input"),
    ("PgUp/PgDn", "Page through history"),
    ("Mouse wheel", "Scroll through history"),
    ("Esc", "Cancel the running command"),
    ("Ctrl+U", "Clear current input"),
];

fn heading(text: &str) -> Line<'static> {
    Line::from(Span::styled(
        format!("{}:", text),
        Style::default()
            .fg(Color::Cyan)
            .add_modifier(Modifier::UNDERLINED),
    ))
}

fn entry(name: &str, description: &str) -> Line<'static> {
    Line::from(vec![
        Span::styled(format!("  {:<16}", name), Style::default().fg(Color::LightBlue)),
        Span::raw(description.to_string()),
    ])
}

pub fn help_lines() -> Vec<Line<'static>> {
    let mut lines = vec![
        Line::from(Span::styled(
            TITLE,
            Style::default()
                .fg(Color::Green)
                .add_modifier(Modifier::BOLD),
        )),
        Line::from("Press Esc or F1 to return."),
    ];

    for section in SECTIONS {
        lines.push(Line::from(""));
        lines.push(heading(section.title));
        lines.extend(section.entries.iter().map(|(name, description)| entry(name, description)));
    }

    lines.push(Line::from(""));
    lines.push(heading("Navigation"));
    lines.extend(NAVIGATION.iter().map(|(key, description)| entry(key, description)));

    lines.push(Line::from(""));
    lines.push(heading("Examples"));
    lines.extend(EXAMPLES.iter().map(|example| Line::from(format!("  {}", example))));
    lines
}

pub fn render_help(frame: &mut Frame, app: &mut App) {
    let block = Block::default()
        .borders(Borders::ALL)
        .border_type(BorderType::Double)
        .border_style(Style::default().fg(Color::Yellow))
        .title(" Menu ")
        .title_alignment(Alignment::Center)
        .style(Style::default().bg(Color::Black));

    let lines = help_lines();
    let max_scroll = lines.len().saturating_sub(1);
    app.help_scroll = app.help_scroll.min(max_scroll);

    let paragraph = Paragraph::new(lines)
        .block(block)
        .alignment(Alignment::Left)
        .wrap(Wrap { trim: false })
        .scroll((u16::try_from(app.help_scroll).unwrap_or(u16::MAX), 0));

    frame.render_widget(Clear, frame.size());
    frame.render_widget(paragraph, frame.size());
}
