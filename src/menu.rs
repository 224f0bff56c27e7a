pub struct MenuSection {
    pub title: &'static str,
    pub entries: &'static [(&'static str, &'static str)],
}

pub const TITLE: &str = "SMCTL sci-calc";

pub const SECTIONS: &[MenuSection] = &[
    MenuSection {
        title: "Trigonometric (radians)",
        entries: &[
            ("sin(x)", "Sine"),
            ("cos(x)", "Cosine"),
            ("tan(x)", "Tangent"),
            ("asin(x)", "Arc sine"),
            ("acos(x)", "Arc cosine"),
            ("atan(x)", "Arc tangent"),
        ],
    },
    MenuSection {
        title: "Hyperbolic",
        entries: &[
            ("sinh(x)", "Hyperbolic sine"),
            ("cosh(x)", "Hyperbolic cosine"),
            ("tanh(x)", "Hyperbolic tangent"),
            ("asinh(x)", "Inverse hyperbolic sine"),
            ("acosh(x)", "Inverse hyperbolic cosine (x >= 1)"),
            ("atanh(x)", "Inverse hyperbolic tangent (|x| < 1)"),
        ],
    },
    MenuSection {
        title: "Power/Root",
        entries: &[
            ("pow(b, e)", "b raised to e (same as b ^ e)"),
            ("sqrt(x)", "Square root"),
            ("cbrt(x)", "Cube root"),
            ("exp(x)", "e raised to x"),
            ("log(x)", "Natural logarithm (also ln)"),
            ("log10(x)", "Base-10 logarithm"),
        ],
    },
    MenuSection {
        title: "Rounding",
        entries: &[
            ("floor(x)", "Round down"),
            ("ceil(x)", "Round up"),
            ("round(x)", "Round half away from zero"),
        ],
    },
    MenuSection {
        title: "Absolute/Min/Max",
        entries: &[
            ("abs(x)", "Absolute value"),
            ("min(a, b)", "Smaller of a and b"),
            ("max(a, b)", "Larger of a and b"),
        ],
    },
    MenuSection {
        title: "Operators and constants",
        entries: &[
            ("+ - * / %", "Arithmetic, % is the floating-point remainder"),
            ("^", "Power, right-associative; -2^2 = 4"),
            ("pi, e", "Constants"),
        ],
    },
    MenuSection {
        title: "Commands",
        entries: &[
            ("f", "Factorial of an integer n"),
            ("g", "Greatest common divisor of a and b"),
            ("l", "Least common multiple of a and b"),
            ("p", "Product of f(x) for integer x from start to end"),
            ("s", "Sum of f(x) for integer x from start to end"),
            ("graph", "ASCII graph of f(x) (alias: plot)"),
            ("details <expr>", "Step-by-step evaluation"),
            ("cancel", "Abort the current command"),
            ("clear", "Clear history"),
            ("m", "Show this menu"),
            ("q", "Quit"),
        ],
    },
];

pub const EXAMPLES: &[&str] = &[
    "5+4*8-sin(pi/2)+pow(2,3)",
    "details sqrt(2)^2",
    "log10(1000) % 2",
];

/// The menu as plain text lines.
pub fn menu_lines() -> Vec<String> {
    let mut lines = vec![TITLE.to_string()];
    for section in SECTIONS {
        lines.push(String::new());
        lines.push(section.title.to_string());
        for (name, description) in section.entries {
            lines.push(format!("  {:<16}{}", name, description));
        }
    }
    lines.push(String::new());
    lines.push("Examples:".to_string());
    lines.extend(EXAMPLES.iter().map(|e| format!("  {}", e)));
    lines
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::calc_engine::compile;

    #[test]
    fn examples_compile() {
        for example in EXAMPLES {
            let source = example.strip_prefix("details ").unwrap_or(example);
            assert!(compile(source).is_ok(), "{}", example);
        }
    }

    #[test]
    fn every_listed_function_is_known() {
        let engine = crate::calc_engine::engine();
        for section in &SECTIONS[..5] {
            for (name, _) in section.entries {
                let function = name.split('(').next().unwrap_or_default();
                assert!(engine.symbols().is_function(function), "{}", function);
            }
        }
    }

    #[test]
    fn plain_text_lists_commands() {
        let lines = menu_lines();
        assert!(lines.iter().any(|l| l.trim_start().starts_with("graph")));
    }
}
