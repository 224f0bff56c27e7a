use crate::calc_engine::engine;
use crate::plot::{Canvas, Cell};
use ratatui::style::{Color, Modifier, Style};
use ratatui::text::{Line, Span};

pub fn is_math_function(word: &str) -> bool {
    engine().symbols().is_function(&word.to_lowercase())
}

fn is_constant(word: &str) -> bool {
    engine().symbols().constant(&word.to_lowercase()).is_some()
}

fn word_style(word: &str, base_style: Style) -> Style {
    if is_math_function(word) {
        Style::default()
            .fg(Color::LightBlue)
            .add_modifier(Modifier::BOLD)
    } else if is_constant(word) {
        Style::default().fg(Color::LightCyan)
    } else if word.eq_ignore_ascii_case("x") {
        Style::default()
            .fg(Color::LightYellow)
            .add_modifier(Modifier::ITALIC)
    } else {
        base_style
    }
}

/// Splits an expression into styled spans. Works on incomplete input, so it scans characters
/// instead of relying on the tokenizer.
pub fn highlight_functions(expr: &str, base_style: Style) -> Vec<Span<'static>> {
    let operator_style = Style::default()
        .fg(Color::Yellow)
        .add_modifier(Modifier::BOLD);
    let number_style = Style::default().fg(Color::LightGreen);

    let chars: Vec<char> = expr.chars().collect();
    let mut spans = Vec::new();
    let mut i = 0;

    while i < chars.len() {
        let c = chars[i];
        let start = i;

        if c.is_alphabetic() || c == '_' {
            while i < chars.len() && (chars[i].is_alphanumeric() || chars[i] == '_') {
                i += 1;
            }
            let word: String = chars[start..i].iter().collect();
            let style = word_style(&word, base_style);
            spans.push(Span::styled(word, style));
        } else if c.is_ascii_digit() || c == '.' {
            while i < chars.len() && (chars[i].is_ascii_digit() || chars[i] == '.') {
                i += 1;
            }
            // exponent only when digits follow, otherwise `2e` is 2 then the constant e
            if i < chars.len() && matches!(chars[i], 'e' | 'E') {
                let mut j = i + 1;
                if j < chars.len() && matches!(chars[j], '+' | '-') {
                    j += 1;
                }
                if j < chars.len() && chars[j].is_ascii_digit() {
                    i = j;
                    while i < chars.len() && chars[i].is_ascii_digit() {
                        i += 1;
                    }
                }
            }
            spans.push(Span::styled(
                chars[start..i].iter().collect::<String>(),
                number_style,
            ));
        } else {
            i += 1;
            let style = match c {
                '+' | '-' | '*' | '/' | '^' | '%' => operator_style,
                ' ' => Style::default(),
                _ => base_style,
            };
            spans.push(Span::styled(c.to_string(), style));
        }
    }

    spans
}

/// One canvas row with points and axes in different colours.
pub fn canvas_line(canvas: &Canvas, row: usize) -> Line<'static> {
    let point_style = Style::default()
        .fg(Color::LightGreen)
        .add_modifier(Modifier::BOLD);
    let axis_style = Style::default().fg(Color::DarkGray);

    let mut spans: Vec<Span<'static>> = Vec::new();
    let mut run = String::new();
    let mut run_cell = Cell::Empty;

    for &cell in canvas.row_cells(row).unwrap_or(&[]) {
        let same_kind = (cell == Cell::Point) == (run_cell == Cell::Point);
        if !same_kind && !run.is_empty() {
            let style = if run_cell == Cell::Point { point_style } else { axis_style };
            spans.push(Span::styled(std::mem::take(&mut run), style));
        }
        run.push(cell.symbol());
        run_cell = cell;
    }
    if !run.is_empty() {
        let style = if run_cell == Cell::Point { point_style } else { axis_style };
        spans.push(Span::styled(run, style));
    }

    Line::from(spans)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::plot::{render_source, PlotWindow};
    use pretty_assertions::assert_eq;

    fn texts(spans: &[Span]) -> Vec<String> {
        spans.iter().map(|s| s.content.to_string()).collect()
    }

    #[test]
    fn known_names() {
        assert!(is_math_function("sin"));
        assert!(is_math_function("LN"));
        assert!(!is_math_function("pi"));
        assert!(is_constant("pi"));
    }

    #[test]
    fn splits_words_numbers_and_operators() {
        let spans = highlight_functions("2.5e-3*sin(x)+2e", Style::default());
        assert_eq!(
            texts(&spans),
            vec!["2.5e-3", "*", "sin", "(", "x", ")", "+", "2", "e"]
        );
        assert_eq!(spans[2].style.fg, Some(Color::LightBlue));
        assert_eq!(spans[0].style.fg, Some(Color::LightGreen));
    }

    #[test]
    fn incomplete_input_is_fine() {
        let spans = highlight_functions("max(1, ", Style::default());
        assert_eq!(texts(&spans), vec!["max", "(", "1", ",", " "]);
    }

    #[test]
    fn canvas_rows_keep_their_text() {
        let window = PlotWindow::new(21, 7, (-1.0, 1.0), (-1.0, 1.0));
        let canvas = render_source("x", &window).unwrap();
        for (row, text) in canvas.rows().enumerate() {
            let line = canvas_line(&canvas, row);
            let joined: String = line.spans.iter().map(|s| &*s.content).collect();
            assert_eq!(joined, text);
        }
    }
}
