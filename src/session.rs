use crate::calc_engine::{compile, EvaluationContext, EvaluationTrace, Step};
use crate::config::{range_samples, GraphDefaults};
use crate::error::{CalcError, CalcResult};
use crate::format::{format_number, format_with_spaces};
use crate::plot::{render, Canvas, PlotWindow};
use crate::sampler::{finite_min_max, min_max_of};
use crate::series;

pub const IDLE_PROMPT: &str = "SciCalc > ";

/// What the front end should show after one line of input.
#[derive(Debug)]
pub enum Reply {
    /// Blank input at the top level.
    Nothing,
    /// A dialog advanced; the next question is [`Session::prompt`].
    Pending,
    Value {
        label: String,
        value: f64,
    },
    Trace {
        label: String,
        value: f64,
        steps: Vec<Step>,
    },
    Graph {
        source: String,
        canvas: Canvas,
    },
    Message(String),
    Error(String),
    Menu,
    Cleared,
    Quit,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum PairOp {
    Gcd,
    Lcm,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SeriesOp {
    Sum,
    Product,
}

#[derive(Debug, Default)]
struct GraphDraft {
    source: Option<String>,
    width: Option<usize>,
    height: Option<usize>,
    x_min: Option<f64>,
    x_max: Option<f64>,
}

impl GraphDraft {
    fn prompt(&self, defaults: &GraphDefaults) -> String {
        if self.source.is_none() {
            "Enter expression in terms of x (e.g., x^2, sin(x)): ".to_string()
        } else if self.width.is_none() {
            format!("Enter graph width (default {}): ", defaults.width)
        } else if self.height.is_none() {
            format!("Enter graph height (default {}): ", defaults.height)
        } else if self.x_min.is_none() {
            format!("Enter X-min (default {}): ", defaults.x_min)
        } else if self.x_max.is_none() {
            format!("Enter X-max (default {}): ", defaults.x_max)
        } else {
            format!(
                "Enter plot density factor (integer, default {}, higher is more detailed): ",
                defaults.density
            )
        }
    }
}

#[derive(Debug, Default)]
enum Dialog {
    #[default]
    Idle,
    Factorial,
    Pair {
        op: PairOp,
        a: Option<f64>,
    },
    Series {
        op: SeriesOp,
        source: Option<String>,
        start: Option<i64>,
    },
    Graph(GraphDraft),
}

/// The scientific calculator conversation: plain expressions are answered at once, commands
/// such as `s` or `graph` ask for their inputs one line at a time.
pub struct Session {
    dialog: Dialog,
    graph: GraphDefaults,
}

impl Session {
    pub fn new(graph: GraphDefaults) -> Self {
        Session {
            dialog: Dialog::Idle,
            graph,
        }
    }

    pub fn is_idle(&self) -> bool {
        matches!(self.dialog, Dialog::Idle)
    }

    pub fn prompt(&self) -> String {
        match &self.dialog {
            Dialog::Idle => IDLE_PROMPT.to_string(),
            Dialog::Factorial => "Enter integer value for factorial n: ".to_string(),
            Dialog::Pair { a: None, .. } => "Enter a: ".to_string(),
            Dialog::Pair { .. } => "Enter b: ".to_string(),
            Dialog::Series { source: None, .. } => "Enter function f(x) for series: ".to_string(),
            Dialog::Series { start: None, .. } => "Enter integer start index for x: ".to_string(),
            Dialog::Series { .. } => "Enter integer end index for x: ".to_string(),
            Dialog::Graph(draft) => draft.prompt(&self.graph),
        }
    }

    pub fn submit(&mut self, line: &str) -> Reply {
        let input = line.trim();
        if !self.is_idle() && input.eq_ignore_ascii_case("cancel") {
            self.dialog = Dialog::Idle;
            return Reply::Message("Cancelled.".to_string());
        }

        match std::mem::take(&mut self.dialog) {
            Dialog::Idle => self.command(input),
            Dialog::Factorial => self.factorial_step(input),
            Dialog::Pair { op, a } => self.pair_step(op, a, input),
            Dialog::Series { op, source, start } => self.series_step(op, source, start, input),
            Dialog::Graph(draft) => self.graph_step(draft, input),
        }
    }

    fn command(&mut self, input: &str) -> Reply {
        if input.is_empty() {
            return Reply::Nothing;
        }

        match input.to_lowercase().as_str() {
            "q" | "quit" | "exit" => return Reply::Quit,
            "m" | "menu" | "help" => return Reply::Menu,
            "clear" | "reset" => return Reply::Cleared,
            "graph" | "plot" => {
                self.dialog = Dialog::Graph(GraphDraft::default());
                return Reply::Pending;
            }
            _ => {}
        }

        let mut chars = input.chars();
        if let (Some(c), None) = (chars.next(), chars.next()) {
            if c.is_alphabetic() {
                return self.letter(c.to_ascii_lowercase());
            }
        }

        let (detailed, source) = split_details(input);
        if source.is_empty() {
            return Reply::Error("Please enter a valid expression after 'details'".to_string());
        }
        evaluate(source, detailed)
    }

    fn letter(&mut self, c: char) -> Reply {
        self.dialog = match c {
            'f' => Dialog::Factorial,
            'g' => Dialog::Pair { op: PairOp::Gcd, a: None },
            'l' => Dialog::Pair { op: PairOp::Lcm, a: None },
            'p' => Dialog::Series { op: SeriesOp::Product, source: None, start: None },
            's' => Dialog::Series { op: SeriesOp::Sum, source: None, start: None },
            _ => {
                return Reply::Error("Unknown single-letter command. Try 'm' for menu.".to_string())
            }
        };
        Reply::Pending
    }

    fn factorial_step(&mut self, input: &str) -> Reply {
        let n = match read_integer(input) {
            Ok(n) => n,
            Err(message) => {
                self.dialog = Dialog::Factorial;
                return Reply::Error(message);
            }
        };
        match series::factorial(n) {
            Ok(value) => Reply::Value {
                label: format!("Factorial({})", n),
                value,
            },
            Err(e) => Reply::Error(e.to_string()),
        }
    }

    fn pair_step(&mut self, op: PairOp, a: Option<f64>, input: &str) -> Reply {
        let value = match read_real(input) {
            Ok(v) => v,
            Err(message) => {
                self.dialog = Dialog::Pair { op, a };
                return Reply::Error(message);
            }
        };
        let Some(a) = a else {
            self.dialog = Dialog::Pair { op, a: Some(value) };
            return Reply::Pending;
        };

        let (name, result) = match op {
            PairOp::Gcd => ("GCD", series::gcd(a, value)),
            PairOp::Lcm => ("LCM", series::lcm(a, value)),
        };
        Reply::Value {
            label: format!("{}({}, {})", name, format_number(a), format_number(value)),
            value: result,
        }
    }

    fn series_step(
        &mut self,
        op: SeriesOp,
        source: Option<String>,
        start: Option<i64>,
        input: &str,
    ) -> Reply {
        let Some(source) = source else {
            if let Err(message) = check_expression(input) {
                self.dialog = Dialog::Series { op, source: None, start: None };
                return Reply::Error(message);
            }
            self.dialog = Dialog::Series { op, source: Some(input.to_string()), start: None };
            return Reply::Pending;
        };

        let index = match read_integer(input) {
            Ok(i) => i,
            Err(message) => {
                self.dialog = Dialog::Series { op, source: Some(source), start };
                return Reply::Error(message);
            }
        };
        let Some(start) = start else {
            self.dialog = Dialog::Series { op, source: Some(source), start: Some(index) };
            return Reply::Pending;
        };

        let (name, result) = match op {
            SeriesOp::Sum => ("Sum", series::sum(&source, start, index)),
            SeriesOp::Product => ("Product", series::product(&source, start, index)),
        };
        match result {
            Ok(value) => Reply::Value {
                label: format!(
                    "{} of {} for x = {}..{}",
                    name,
                    format_with_spaces(&source),
                    start,
                    index
                ),
                value,
            },
            Err(e) => Reply::Error(e.to_string()),
        }
    }

    fn graph_step(&mut self, mut draft: GraphDraft, input: &str) -> Reply {
        let defaults = self.graph;

        if draft.source.is_none() {
            if input.is_empty() {
                return Reply::Message("No expression entered. Aborting graph.".to_string());
            }
            let reply = match check_expression(input) {
                Ok(()) => {
                    draft.source = Some(input.to_string());
                    Reply::Pending
                }
                Err(message) => Reply::Error(message),
            };
            self.dialog = Dialog::Graph(draft);
            return reply;
        }

        let step = if draft.width.is_none() {
            read_count(input, defaults.width).map(|v| draft.width = Some(v))
        } else if draft.height.is_none() {
            read_count(input, defaults.height).map(|v| draft.height = Some(v))
        } else if draft.x_min.is_none() {
            read_real_or(input, defaults.x_min).map(|v| draft.x_min = Some(v))
        } else if draft.x_max.is_none() {
            read_real_or(input, defaults.x_max).map(|v| draft.x_max = Some(v))
        } else {
            return match read_count(input, defaults.density) {
                Ok(density) => draw(draft, density.max(1)),
                Err(message) => {
                    self.dialog = Dialog::Graph(draft);
                    Reply::Error(message)
                }
            };
        };

        self.dialog = Dialog::Graph(draft);
        match step {
            Ok(()) => Reply::Pending,
            Err(message) => Reply::Error(message),
        }
    }
}

impl Default for Session {
    fn default() -> Self {
        Session::new(GraphDefaults::default())
    }
}

fn split_details(input: &str) -> (bool, &str) {
    const PREFIX: &str = "details ";
    const SUFFIX: &str = " details";

    if input.eq_ignore_ascii_case("details") {
        return (true, "");
    }
    if let Some(head) = input.get(..PREFIX.len()) {
        if head.eq_ignore_ascii_case(PREFIX) {
            return (true, input[PREFIX.len()..].trim());
        }
    }
    if let Some(split) = input.len().checked_sub(SUFFIX.len()) {
        if let Some(tail) = input.get(split..) {
            if tail.eq_ignore_ascii_case(SUFFIX) {
                return (true, input[..split].trim());
            }
        }
    }
    (false, input)
}

fn evaluate(source: &str, detailed: bool) -> Reply {
    let expr = match compile(source) {
        Ok(expr) => expr,
        Err(e) => return Reply::Error(CalcError::from(e).to_string()),
    };
    let label = format_with_spaces(source);
    let ctx = EvaluationContext::new();

    if detailed {
        let mut trace = EvaluationTrace::new(true);
        let value = expr.eval_traced(&ctx, &mut trace);
        Reply::Trace {
            label,
            value,
            steps: trace.steps,
        }
    } else {
        Reply::Value {
            label,
            value: expr.eval_in(&ctx),
        }
    }
}

fn draw(draft: GraphDraft, density: usize) -> Reply {
    let GraphDraft {
        source: Some(source),
        width: Some(width),
        height: Some(height),
        x_min: Some(x_min),
        x_max: Some(x_max),
    } = draft
    else {
        return Reply::Error("incomplete graph parameters".to_string());
    };

    match plot_graph(&source, width, height, (x_min, x_max), density) {
        Ok(canvas) => Reply::Graph { source, canvas },
        Err(e) => Reply::Error(e.to_string()),
    }
}

/// Estimates the y range of `source` over `x` and renders it. An unbounded range falls back to
/// the finite samples so that something can still be drawn.
pub fn plot_graph(
    source: &str,
    width: usize,
    height: usize,
    x: (f64, f64),
    density: usize,
) -> CalcResult<Canvas> {
    let mut window = PlotWindow::new(width, height, x, (0.0, 0.0)).with_density(density);
    window.validate()?;

    let expr = compile(source)?;
    let samples = range_samples(width, density);
    let (mut lo, mut hi) = min_max_of(&expr, x.0, x.1, samples)?;
    if !lo.is_finite() || !hi.is_finite() {
        log::info!("'{}' is unbounded on [{}, {}], using finite samples", source, x.0, x.1);
        (lo, hi) = finite_min_max(&expr, x.0, x.1, samples)?;
    }
    log::info!("calculated y range [{}, {}] from {} samples", lo, hi, samples);

    window.y_min = lo;
    window.y_max = hi;
    render(&expr, &window)
}

/// One-line description of a rendered graph, shared by the front ends.
pub fn graph_caption(source: &str, canvas: &Canvas) -> String {
    let (x_min, x_max) = canvas.x_range();
    let (y_min, y_max) = canvas.y_range();
    format!(
        "y = {}   x: [{}, {}]   y: [{}, {}]",
        format_with_spaces(source),
        format_number(x_min),
        format_number(x_max),
        format_number(y_min),
        format_number(y_max)
    )
}

fn check_expression(input: &str) -> Result<(), String> {
    if input.is_empty() {
        return Err("Please enter a function f(x)".to_string());
    }
    compile(input)
        .map(|_| ())
        .map_err(|e| CalcError::from(e).to_string())
}

fn read_integer(input: &str) -> Result<i64, String> {
    input
        .parse::<i64>()
        .map_err(|_| format!("'{}' is not an integer, please try again", input))
}

/// Reads a real number, allowing constant expressions such as `-pi/2`.
fn read_real(input: &str) -> Result<f64, String> {
    if input.is_empty() {
        return Err("Please enter a number".to_string());
    }
    let expr = compile(input).map_err(|e| format!("Invalid number: {}", e))?;
    if !expr.free_variables().is_empty() {
        return Err("A number cannot depend on x".to_string());
    }
    let value = expr.evaluate(0.0);
    if !value.is_finite() {
        return Err(format!("{} is not a finite number", format_number(value)));
    }
    Ok(value)
}

fn read_real_or(input: &str, default: f64) -> Result<f64, String> {
    if input.is_empty() {
        Ok(default)
    } else {
        read_real(input)
    }
}

fn read_count(input: &str, default: usize) -> Result<usize, String> {
    if input.is_empty() {
        return Ok(default);
    }
    input
        .parse::<usize>()
        .map_err(|_| format!("'{}' is not a non-negative integer, please try again", input))
}
