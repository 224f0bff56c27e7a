use crate::calc_engine::{compile, Expression};
use crate::error::{CalcError, CalcResult};
use crate::sampler::samples;
use std::fmt;

/// Largest canvas `render` will allocate.
pub const MAX_CELLS: usize = 1 << 24;

/// Everything a render needs besides the expression.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PlotWindow {
    pub width: usize,
    pub height: usize,
    pub x_min: f64,
    pub x_max: f64,
    pub y_min: f64,
    pub y_max: f64,
    /// Samples per column; the plot always evaluates at least `width` points.
    pub density: usize,
}

impl PlotWindow {
    pub fn new(width: usize, height: usize, x: (f64, f64), y: (f64, f64)) -> Self {
        PlotWindow {
            width,
            height,
            x_min: x.0,
            x_max: x.1,
            y_min: y.0,
            y_max: y.1,
            density: 1,
        }
    }

    pub fn with_density(mut self, density: usize) -> Self {
        self.density = density;
        self
    }

    pub(crate) fn validate(&self) -> CalcResult<()> {
        if self.width == 0 || self.height == 0 {
            return Err(CalcError::validation(format!(
                "graph width and height must be positive (got {}x{})",
                self.width, self.height
            )));
        }
        if self.width.checked_mul(self.height).map_or(true, |cells| cells > MAX_CELLS) {
            return Err(CalcError::validation(format!(
                "graph of {}x{} exceeds {} cells",
                self.width, self.height, MAX_CELLS
            )));
        }
        if !self.x_min.is_finite() || !self.x_max.is_finite() {
            return Err(CalcError::validation("x bounds must be finite"));
        }
        if self.x_min >= self.x_max {
            return Err(CalcError::validation(format!(
                "x-min ({}) must be less than x-max ({})",
                self.x_min, self.x_max
            )));
        }
        if !(self.x_max - self.x_min).is_finite() {
            return Err(CalcError::validation("x range is too wide"));
        }
        if !self.y_min.is_finite() || !self.y_max.is_finite() {
            return Err(CalcError::validation("y bounds must be finite"));
        }
        if !(self.y_max - self.y_min).is_finite() {
            return Err(CalcError::validation("y range is too wide"));
        }
        Ok(())
    }

    fn sample_count(&self) -> usize {
        self.width.max(self.width.saturating_mul(self.density))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Cell {
    Empty,
    HorizontalAxis,
    VerticalAxis,
    Origin,
    Point,
}

impl Cell {
    pub fn symbol(self) -> char {
        match self {
            Cell::Empty => ' ',
            Cell::HorizontalAxis => '-',
            Cell::VerticalAxis => '|',
            Cell::Origin => '+',
            Cell::Point => '*',
        }
    }

    pub fn is_axis(self) -> bool {
        matches!(self, Cell::HorizontalAxis | Cell::VerticalAxis | Cell::Origin)
    }
}

/// A rendered graph: `height` rows of `width` cells, row 0 at the top.
#[derive(Debug, Clone, PartialEq)]
pub struct Canvas {
    width: usize,
    height: usize,
    cells: Vec<Cell>,
    axis_row: usize,
    axis_col: usize,
    x_range: (f64, f64),
    y_range: (f64, f64),
}

impl Canvas {
    fn blank(window: &PlotWindow, y_range: (f64, f64)) -> Self {
        Canvas {
            width: window.width,
            height: window.height,
            cells: vec![Cell::Empty; window.width * window.height],
            axis_row: 0,
            axis_col: 0,
            x_range: (window.x_min, window.x_max),
            y_range,
        }
    }

    pub fn width(&self) -> usize {
        self.width
    }

    pub fn height(&self) -> usize {
        self.height
    }

    pub fn axis_row(&self) -> usize {
        self.axis_row
    }

    pub fn axis_col(&self) -> usize {
        self.axis_col
    }

    pub fn x_range(&self) -> (f64, f64) {
        self.x_range
    }

    /// The y bounds actually drawn, after widening a degenerate range.
    pub fn y_range(&self) -> (f64, f64) {
        self.y_range
    }

    pub fn cell(&self, row: usize, col: usize) -> Option<Cell> {
        if row < self.height && col < self.width {
            Some(self.cells[row * self.width + col])
        } else {
            None
        }
    }

    pub fn row_cells(&self, row: usize) -> Option<&[Cell]> {
        if row < self.height {
            self.cells.get(row * self.width..(row + 1) * self.width)
        } else {
            None
        }
    }

    pub fn rows(&self) -> impl Iterator<Item = String> + '_ {
        self.cells
            .chunks(self.width)
            .map(|row| row.iter().map(|c| c.symbol()).collect::<String>())
    }

    pub fn point_count(&self) -> usize {
        self.cells.iter().filter(|c| **c == Cell::Point).count()
    }

    fn set(&mut self, row: usize, col: usize, cell: Cell) {
        self.cells[row * self.width + col] = cell;
    }
}

impl fmt::Display for Canvas {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, row) in self.rows().enumerate() {
            if i > 0 {
                writeln!(f)?;
            }
            write!(f, "{}", row)?;
        }
        Ok(())
    }
}

/// Widens an empty or inverted y range around its midpoint until it has positive height.
fn expand_codomain(y_min: f64, y_max: f64) -> (f64, f64) {
    if y_min < y_max {
        return (y_min, y_max);
    }
    let (mut lo, mut hi) = (y_min - 0.5, y_max + 0.5);
    let mid = y_min / 2.0 + y_max / 2.0;
    let mut pad = 0.5;
    while lo >= hi {
        pad *= 2.0;
        lo = mid - pad;
        hi = mid + pad;
    }
    log::debug!("expanded y range [{}, {}] to [{}, {}]", y_min, y_max, lo, hi);
    (lo, hi)
}

// Fractional cell index of `offset` within a span of `span` units drawn over `cells` cells.
fn scale(offset: f64, span: f64, cells: usize) -> f64 {
    offset * (cells - 1) as f64 / span
}

fn to_cell(position: f64, cells: usize) -> Option<usize> {
    let rounded = position.round();
    if rounded >= 0.0 && rounded <= (cells - 1) as f64 {
        Some(rounded as usize)
    } else {
        None
    }
}

fn axis_index(lo: f64, hi: f64, offset_of_zero: f64, cells: usize, below: usize, above: usize) -> usize {
    if lo > 0.0 {
        below
    } else if hi < 0.0 {
        above
    } else {
        to_cell(scale(offset_of_zero, hi - lo, cells), cells).unwrap_or(below)
    }
}

pub fn render_source(source: &str, window: &PlotWindow) -> CalcResult<Canvas> {
    window.validate()?;
    let expr = compile(source)?;
    render(&expr, window)
}

pub fn render(expr: &Expression, window: &PlotWindow) -> CalcResult<Canvas> {
    window.validate()?;
    let (y_min, y_max) = expand_codomain(window.y_min, window.y_max);
    if !(y_max - y_min).is_finite() {
        return Err(CalcError::validation("y range is too wide"));
    }
    let (x_min, x_max) = (window.x_min, window.x_max);
    let (width, height) = (window.width, window.height);

    let mut canvas = Canvas::blank(window, (y_min, y_max));

    // Rows grow downwards, so an all-positive range puts the x-axis on the bottom row.
    canvas.axis_row = axis_index(y_min, y_max, y_max, height, height - 1, 0);
    canvas.axis_col = axis_index(x_min, x_max, -x_min, width, 0, width - 1);

    for col in 0..width {
        canvas.set(canvas.axis_row, col, Cell::HorizontalAxis);
    }
    for row in 0..height {
        canvas.set(row, canvas.axis_col, Cell::VerticalAxis);
    }
    canvas.set(canvas.axis_row, canvas.axis_col, Cell::Origin);

    let n = window.sample_count();
    let mut dropped = 0usize;
    for sample in samples(expr, x_min, x_max, n) {
        if !sample.y.is_finite() {
            dropped += 1;
            continue;
        }
        let col = to_cell(scale(sample.x - x_min, x_max - x_min, width), width);
        let row = to_cell(scale(y_max - sample.y, y_max - y_min, height), height);
        match (row, col) {
            (Some(row), Some(col)) => canvas.set(row, col, Cell::Point),
            _ => dropped += 1,
        }
    }

    log::debug!(
        "rendered '{}' on {}x{} from {} samples ({} dropped)",
        expr.source(),
        width,
        height,
        n,
        dropped
    );
    Ok(canvas)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::f64::consts::PI;

    fn window(width: usize, height: usize, x: (f64, f64), y: (f64, f64)) -> PlotWindow {
        PlotWindow::new(width, height, x, y)
    }

    #[test]
    fn constant_function_keeps_declared_dimensions() {
        let canvas = render_source("5", &window(40, 10, (-1.0, 1.0), (-1.0, 1.0))).unwrap();
        assert_eq!(canvas.width(), 40);
        assert_eq!(canvas.height(), 10);
        assert_eq!(canvas.rows().count(), 10);
        assert!(canvas.rows().all(|row| row.chars().count() == 40));
        // 5 lies above the window, nothing is drawn
        assert_eq!(canvas.point_count(), 0);
    }

    #[test]
    fn degenerate_codomain_is_widened() {
        let canvas = render_source("5", &window(40, 10, (-1.0, 1.0), (5.0, 5.0))).unwrap();
        assert_eq!(canvas.y_range(), (4.5, 5.5));
        assert_eq!(canvas.height(), 10);
        // whole range positive: x-axis on the bottom row
        assert_eq!(canvas.axis_row(), 9);
        assert_eq!(canvas.point_count(), 40);
        assert!(canvas.row_cells(5).unwrap().iter().all(|c| *c == Cell::Point));
    }

    #[test]
    fn inverted_codomain_is_widened_until_positive() {
        let canvas = render_source("x", &window(10, 5, (-1.0, 1.0), (3.0, 1.0))).unwrap();
        let (lo, hi) = canvas.y_range();
        assert!(lo < hi);
        assert!(lo <= 1.0 && hi >= 3.0);
    }

    #[test]
    fn huge_constant_range_terminates() {
        let (lo, hi) = expand_codomain(1e20, 1e20);
        assert!(lo < hi);
    }

    #[test]
    fn axes_cross_at_origin_when_visible() {
        let canvas = render_source("100", &window(41, 21, (-PI, PI), (-1.0, 1.0))).unwrap();
        assert_eq!(canvas.axis_row(), 10);
        assert_eq!(canvas.axis_col(), 20);
        assert_eq!(canvas.cell(10, 20), Some(Cell::Origin));
        assert_eq!(canvas.cell(10, 0), Some(Cell::HorizontalAxis));
        assert_eq!(canvas.cell(0, 20), Some(Cell::VerticalAxis));
        assert_eq!(canvas.cell(21, 0), None);
    }

    #[test]
    fn one_sided_ranges_pin_axes_to_edges() {
        let canvas = render_source("100", &window(20, 8, (1.0, 5.0), (1.0, 3.0))).unwrap();
        assert_eq!(canvas.axis_row(), 7);
        assert_eq!(canvas.axis_col(), 0);
        assert_eq!(canvas.cell(7, 0), Some(Cell::Origin));

        let canvas = render_source("100", &window(20, 8, (-5.0, -1.0), (-3.0, -1.0))).unwrap();
        assert_eq!(canvas.axis_row(), 0);
        assert_eq!(canvas.axis_col(), 19);
        assert_eq!(canvas.cell(0, 19), Some(Cell::Origin));
    }

    #[test]
    fn sine_crosses_the_axis() {
        let canvas = render_source("sin(x)", &window(41, 21, (-PI, PI), (-1.0, 1.0))).unwrap();
        // sin(0) = 0 overwrites the origin marker
        assert_eq!(canvas.cell(10, 20), Some(Cell::Point));
        // sin(-pi/2) = -1 on the bottom row, sin(pi/2) = 1 on the top row
        assert_eq!(canvas.cell(20, 10), Some(Cell::Point));
        assert_eq!(canvas.cell(0, 30), Some(Cell::Point));
        assert!(canvas.point_count() >= 41 - 2);
    }

    #[test]
    fn nan_region_is_left_blank() {
        let canvas = render_source("sqrt(x)", &window(21, 5, (-1.0, 1.0), (0.0, 1.0))).unwrap();
        for col in 0..10 {
            for row in 0..5 {
                assert_ne!(canvas.cell(row, col), Some(Cell::Point));
            }
        }
        assert_eq!(canvas.cell(0, 20), Some(Cell::Point));
    }

    #[test]
    fn density_adds_samples_not_cells() {
        let sparse = render_source("x^3", &window(20, 20, (-2.0, 2.0), (-8.0, 8.0))).unwrap();
        let dense = render_source(
            "x^3",
            &window(20, 20, (-2.0, 2.0), (-8.0, 8.0)).with_density(8),
        )
        .unwrap();
        assert_eq!(dense.width(), 20);
        assert!(dense.point_count() > sparse.point_count());
    }

    #[test]
    fn zero_density_still_samples_every_column() {
        let canvas = render_source("0.5", &window(10, 3, (-1.0, 1.0), (0.0, 1.0)).with_density(0)).unwrap();
        assert_eq!(canvas.row_cells(1).unwrap().iter().filter(|c| **c == Cell::Point).count(), 10);
    }

    #[test]
    fn single_cell_canvas() {
        let canvas = render_source("x", &window(1, 1, (-1.0, 1.0), (-1.0, 1.0))).unwrap();
        assert_eq!(canvas.to_string().chars().count(), 1);
    }

    #[test]
    fn display_joins_rows() {
        let canvas = render_source("100", &window(3, 3, (-1.0, 1.0), (-1.0, 1.0))).unwrap();
        assert_eq!(canvas.to_string(), " | \n-+-\n | ");
    }

    #[test]
    fn invalid_windows_are_rejected() {
        let bad = [
            window(0, 10, (-1.0, 1.0), (-1.0, 1.0)),
            window(10, 0, (-1.0, 1.0), (-1.0, 1.0)),
            window(10, 10, (1.0, 1.0), (-1.0, 1.0)),
            window(10, 10, (2.0, 1.0), (-1.0, 1.0)),
            window(10, 10, (-1.0, 1.0), (f64::NEG_INFINITY, 1.0)),
        ];
        for w in bad {
            assert!(matches!(render_source("x", &w), Err(CalcError::Validation(_))));
        }
        // validation happens before compiling
        assert!(matches!(
            render_source("2+*3", &window(0, 10, (-1.0, 1.0), (-1.0, 1.0))),
            Err(CalcError::Validation(_))
        ));
        assert!(matches!(
            render_source("2+*3", &window(10, 10, (-1.0, 1.0), (-1.0, 1.0))),
            Err(CalcError::Parse(_))
        ));
    }

    #[test]
    fn oversized_or_overflowing_windows_are_rejected() {
        let bad = [
            window(usize::MAX / 2 + 1, 2, (-1.0, 1.0), (-1.0, 1.0)),
            window(MAX_CELLS, 2, (-1.0, 1.0), (-1.0, 1.0)),
            window(10, 10, (-1e308, 1e308), (-1.0, 1.0)),
            window(10, 10, (-1.0, 1.0), (-1e308, 1e308)),
        ];
        for w in bad {
            assert!(matches!(render_source("x", &w), Err(CalcError::Validation(_))), "{:?}", w);
        }
        assert!(render_source("x", &window(MAX_CELLS / 1024, 1024, (-1.0, 1.0), (-1.0, 1.0))).is_ok());
    }

    #[test]
    fn rows_outside_the_canvas_are_none() {
        let canvas = render_source("x", &window(10, 5, (-1.0, 1.0), (-1.0, 1.0))).unwrap();
        assert_eq!(canvas.row_cells(4).map(<[Cell]>::len), Some(10));
        assert_eq!(canvas.row_cells(5), None);
        assert_eq!(canvas.cell(5, 0), None);
    }
}
