use unicode_width::{UnicodeWidthChar, UnicodeWidthStr};

/// Splits `word` into pieces no wider than `width` columns (at least one char per piece).
fn split_wide_word(word: &str, width: usize) -> Vec<String> {
    let mut pieces = Vec::new();
    let mut piece = String::new();
    let mut piece_width = 0;

    for c in word.chars() {
        let w = c.width_cjk().unwrap_or(1);
        if piece_width + w > width && !piece.is_empty() {
            pieces.push(std::mem::take(&mut piece));
            piece_width = 0;
        }
        piece.push(c);
        piece_width += w;
    }
    if !piece.is_empty() {
        pieces.push(piece);
    }
    pieces
}

/// Greedy word wrap by display width. Words wider than a line are broken up.
pub fn wrap_text(text: &str, width: usize) -> Vec<String> {
    if width == 0 {
        return vec![String::new()];
    }

    let mut lines = Vec::new();
    let mut line = String::new();

    for word in text.split_whitespace() {
        if word.width() > width {
            if !line.is_empty() {
                lines.push(std::mem::take(&mut line));
            }
            lines.extend(split_wide_word(word, width));
            continue;
        }

        if !line.is_empty() && line.width() + 1 + word.width() > width {
            lines.push(std::mem::take(&mut line));
        }
        if !line.is_empty() {
            line.push(' ');
        }
        line.push_str(word);
    }

    if !line.is_empty() {
        lines.push(line);
    }
    lines
}

pub fn format_number(x: f64) -> String {
    if x.is_nan() {
        return "NaN".to_string();
    }
    if x.is_infinite() {
        return if x > 0.0 { "inf" } else { "-inf" }.to_string();
    }
    if x.abs() > 1e10 || (x.abs() < 1e-5 && x != 0.0) {
        format!("{:.6e}", x)
    } else {
        let s = format!("{:.10}", x);
        let s = s.trim_end_matches('0').trim_end_matches('.');
        if s == "-0" {
            "0".to_string()
        } else {
            s.to_string()
        }
    }
}

/// Normalises spacing around operators, parentheses and commas for echoing input back.
pub fn format_with_spaces(expr: &str) -> String {
    let mut result = String::new();
    let mut prev: Option<char> = None;
    let mut before_prev: Option<char> = None;

    for c in expr.chars() {
        match c {
            '+' | '-' | '*' | '/' | '^' | '%' => {
                // a sign directly after an operator or '(' stays attached to its operand,
                // as does the sign of an exponent in `1e-5`
                let exponent = matches!(prev, Some('e' | 'E'))
                    && before_prev.is_some_and(|b| b.is_ascii_digit() || b == '.');
                let is_sign = matches!(c, '+' | '-')
                    && (exponent
                        || matches!(prev, None | Some('(' | ',' | '+' | '-' | '*' | '/' | '^' | '%')));
                if is_sign {
                    result.push(c);
                } else {
                    result.push(' ');
                    result.push(c);
                    result.push(' ');
                }
            }
            ',' => result.push_str(", "),
            _ if c.is_whitespace() => continue,
            _ => result.push(c),
        }
        before_prev = prev;
        prev = Some(c);
    }

    result.split_whitespace().collect::<Vec<_>>().join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn numbers_are_trimmed() {
        assert_eq!(format_number(4.0), "4");
        assert_eq!(format_number(0.25), "0.25");
        assert_eq!(format_number(-0.0), "0");
        assert_eq!(format_number(1e12), "1.000000e12");
        assert_eq!(format_number(f64::NAN), "NaN");
        assert_eq!(format_number(f64::NEG_INFINITY), "-inf");
    }

    #[test]
    fn operators_get_spaces() {
        assert_eq!(format_with_spaces("2+3*4"), "2 + 3 * 4");
        assert_eq!(format_with_spaces("-x^2"), "-x ^ 2");
        assert_eq!(format_with_spaces("pow(2,-3)"), "pow(2, -3)");
        assert_eq!(format_with_spaces("sin( x )  /  2"), "sin(x) / 2");
        assert_eq!(format_with_spaces("2.5e-3*e-1"), "2.5e-3 * e - 1");
    }

    #[test]
    fn long_words_are_split() {
        assert_eq!(wrap_text("abcdef gh", 4), vec!["abcd", "ef", "gh"]);
        assert_eq!(wrap_text("a b c", 3), vec!["a b", "c"]);
    }
}
