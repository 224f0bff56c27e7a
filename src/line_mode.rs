use crate::config::Settings;
use crate::format::{format_number, format_with_spaces};
use crate::menu::menu_lines;
use crate::session::{graph_caption, Reply, Session};
use anyhow::{Context, Result};
use std::io::{self, stdin, stdout, Stdout, Write};
use termion::{
    clear::CurrentLine as ClearLine,
    color,
    cursor::{DetectCursorPos, Goto},
    event::Key,
    input::TermRead,
    raw::{IntoRawMode, RawTerminal},
    style,
};
use unicode_width::UnicodeWidthStr;

type Screen = RawTerminal<Stdout>;

// Функция для преобразования позиции символа в байтовую позицию
fn char_index_to_byte_index(s: &str, char_index: usize) -> usize {
    s.char_indices()
        .nth(char_index)
        .map(|(i, _)| i)
        .unwrap_or_else(|| s.len())
}

/// Lines entered so far, recalled with Up/Down.
#[derive(Default)]
struct History {
    entries: Vec<String>,
    index: usize,
}

impl History {
    fn push(&mut self, line: &str) {
        if !line.is_empty() && self.entries.last().map(String::as_str) != Some(line) {
            self.entries.push(line.to_string());
        }
        self.index = self.entries.len();
    }

    fn clear(&mut self) {
        self.entries.clear();
        self.index = 0;
    }

    fn older(&mut self) -> Option<&str> {
        if self.index == 0 {
            return None;
        }
        self.index -= 1;
        self.entries.get(self.index).map(String::as_str)
    }

    fn newer(&mut self) -> Option<&str> {
        if self.index + 1 < self.entries.len() {
            self.index += 1;
            self.entries.get(self.index).map(String::as_str)
        } else {
            self.index = self.entries.len();
            None
        }
    }
}

enum Input {
    Line(String),
    Interrupted,
}

/// Edits one line in raw mode below `prompt`. Ctrl+C, or Ctrl+D on an empty line, interrupts.
fn read_line(
    screen: &mut Screen,
    keys: &mut impl Iterator<Item = io::Result<Key>>,
    prompt: &str,
    history: &mut History,
) -> Result<Input> {
    write!(screen, "{}{}", ClearLine, prompt)?;
    screen.flush()?;

    let mut line = String::new();
    let mut cursor_pos = 0; // позиция курсора в символах
    let (_, row) = screen.cursor_pos().context("cannot read cursor position")?;

    loop {
        write!(screen, "{}{}{}{}", Goto(1, row), ClearLine, prompt, line)?;
        let prefix: String = line.chars().take(cursor_pos).collect();
        let column = 1 + prompt.width() + prefix.width();
        write!(screen, "{}", Goto(u16::try_from(column).unwrap_or(u16::MAX), row))?;
        screen.flush()?;

        let Some(key) = keys.next() else {
            return Ok(Input::Interrupted);
        };
        match key? {
            Key::Char('\n') => break,
            Key::Ctrl('c') => return Ok(Input::Interrupted),
            Key::Ctrl('d') if line.is_empty() => return Ok(Input::Interrupted),
            Key::Ctrl('u') => {
                line.clear();
                cursor_pos = 0;
            }
            Key::Char(c) => {
                let byte_idx = char_index_to_byte_index(&line, cursor_pos);
                line.insert(byte_idx, c);
                cursor_pos += 1;
            }
            Key::Backspace if cursor_pos > 0 => {
                cursor_pos -= 1;
                let byte_idx = char_index_to_byte_index(&line, cursor_pos);
                line.remove(byte_idx);
            }
            Key::Delete if cursor_pos < line.chars().count() => {
                let byte_idx = char_index_to_byte_index(&line, cursor_pos);
                line.remove(byte_idx);
            }
            Key::Left if cursor_pos > 0 => cursor_pos -= 1,
            Key::Right if cursor_pos < line.chars().count() => cursor_pos += 1,
            Key::Home => cursor_pos = 0,
            Key::End => cursor_pos = line.chars().count(),
            Key::Up => {
                if let Some(entry) = history.older() {
                    line = entry.to_string();
                    cursor_pos = line.chars().count();
                }
            }
            Key::Down => {
                line = history.newer().map(str::to_string).unwrap_or_default();
                cursor_pos = line.chars().count();
            }
            _ => {}
        }
    }

    history.push(line.trim());
    Ok(Input::Line(line))
}

fn print_menu(screen: &mut Screen) -> Result<()> {
    for (i, line) in menu_lines().iter().enumerate() {
        if i == 0 {
            write!(screen, "{}{}{}\r\n", style::Bold, line, style::Reset)?;
        } else {
            write!(screen, "{}\r\n", line)?;
        }
    }
    write!(screen, "\r\n")?;
    Ok(())
}

fn print_reply(screen: &mut Screen, reply: Reply, history: &mut History) -> Result<bool> {
    match reply {
        Reply::Nothing | Reply::Pending => {}
        Reply::Value { label, value } => {
            write!(
                screen,
                "  {} = {}{}{}\r\n\r\n",
                label,
                color::Fg(color::LightMagenta),
                format_number(value),
                style::Reset
            )?;
        }
        Reply::Trace { label, value, steps } => {
            write!(screen, "  {} = {}\r\n", label, format_number(value))?;
            if !steps.is_empty() {
                write!(screen, "\r\n  Step-by-step evaluation:\r\n")?;
                for (i, step) in steps.iter().enumerate() {
                    write!(
                        screen,
                        "  {}Step {}: {} = {}{}\r\n",
                        color::Fg(color::LightBlack),
                        i + 1,
                        format_with_spaces(&step.operation),
                        format_number(step.result),
                        style::Reset
                    )?;
                }
            }
            write!(screen, "\r\n")?;
        }
        Reply::Graph { source, canvas } => {
            write!(screen, "\r\n  {}\r\n\r\n", graph_caption(&source, &canvas))?;
            for row in canvas.rows() {
                write!(screen, "{}\r\n", row)?;
            }
            write!(screen, "\r\n")?;
        }
        Reply::Message(message) => write!(screen, "  {}\r\n", message)?,
        Reply::Error(message) => {
            write!(
                screen,
                "  {}Error: {}{}\r\n",
                color::Fg(color::Red),
                message,
                style::Reset
            )?;
        }
        Reply::Menu => print_menu(screen)?,
        Reply::Cleared => {
            history.clear();
            write!(screen, "  History cleared\r\n\r\n")?;
        }
        Reply::Quit => return Ok(false),
    }
    Ok(true)
}

pub fn run_line(settings: &Settings) -> Result<()> {
    let mut screen = stdout()
        .into_raw_mode()
        .context("cannot switch the terminal to raw mode")?;
    let mut keys = stdin().keys();
    let mut session = Session::new(settings.graph);
    let mut history = History::default();

    print_menu(&mut screen)?;
    log::info!("line mode started");

    loop {
        let prompt = session.prompt();
        let line = match read_line(&mut screen, &mut keys, &prompt, &mut history)? {
            Input::Line(line) => line,
            Input::Interrupted => {
                write!(screen, "\r\n")?;
                break;
            }
        };
        write!(screen, "\r\n")?;

        if !print_reply(&mut screen, session.submit(&line), &mut history)? {
            break;
        }
        screen.flush()?;
    }

    write!(screen, "Goodbye!\r\n")?;
    screen.flush()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn byte_index_of_multibyte_text() {
        assert_eq!(char_index_to_byte_index("π+1", 1), 2);
        assert_eq!(char_index_to_byte_index("π+1", 5), 4);
    }

    #[test]
    fn history_recall() {
        let mut history = History::default();
        history.push("1+1");
        history.push("1+1");
        history.push("sin(pi)");
        assert_eq!(history.entries.len(), 2);

        assert_eq!(history.older(), Some("sin(pi)"));
        assert_eq!(history.older(), Some("1+1"));
        assert_eq!(history.older(), None);
        assert_eq!(history.newer(), Some("sin(pi)"));
        assert_eq!(history.newer(), None);

        history.clear();
        assert_eq!(history.older(), None);
    }
}
