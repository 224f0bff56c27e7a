use crate::error::ParseError;
use std::collections::HashMap;
use std::f64::consts::{E, PI};
use std::iter::Peekable;
use std::str::CharIndices;
use std::sync::OnceLock;

#[derive(Debug, Clone, PartialEq)]
pub enum Token {
    Number(f64),
    Op(char),
    Ident(String),
    LParen,
    RParen,
    Comma,
}

impl Token {
    fn text(&self) -> String {
        match self {
            Token::Number(n) => n.to_string(),
            Token::Op(c) => c.to_string(),
            Token::Ident(name) => name.clone(),
            Token::LParen => "(".to_string(),
            Token::RParen => ")".to_string(),
            Token::Comma => ",".to_string(),
        }
    }
}

/// A token together with the byte offset it starts at.
#[derive(Debug, Clone, PartialEq)]
pub struct Spanned {
    pub token: Token,
    pub pos: usize,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Step {
    pub operation: String,
    pub result: f64,
}

pub struct EvaluationTrace {
    pub steps: Vec<Step>,
    pub detailed_mode: bool,
}

impl EvaluationTrace {
    pub fn new(detailed_mode: bool) -> Self {
        EvaluationTrace {
            steps: Vec::new(),
            detailed_mode,
        }
    }

    pub fn add_step(&mut self, operation: String, result: f64) {
        if self.detailed_mode {
            self.steps.push(Step { operation, result });
        }
    }
}

pub fn tokenize(input: &str) -> Result<Vec<Spanned>, ParseError> {
    let mut tokens = Vec::new();
    let mut chars = input.char_indices().peekable();

    while let Some(&(pos, c)) = chars.peek() {
        let token = match c {
            ' ' | '\t' | '\r' | '\n' => {
                chars.next();
                continue;
            }
            '(' => {
                chars.next();
                Token::LParen
            }
            ')' => {
                chars.next();
                Token::RParen
            }
            ',' => {
                chars.next();
                Token::Comma
            }
            '+' | '-' | '*' | '/' | '^' | '%' => {
                chars.next();
                Token::Op(c)
            }
            '0'..='9' | '.' => {
                let end = scan_number(&mut chars, pos);
                let text = &input[pos..end];
                text.parse::<f64>()
                    .map(Token::Number)
                    .map_err(|_| ParseError::at("invalid number", pos, text))?
            }
            c if c.is_alphabetic() => {
                let mut end = pos;
                while let Some(&(i, ch)) = chars.peek() {
                    if ch.is_alphanumeric() || ch == '_' {
                        end = i + ch.len_utf8();
                        chars.next();
                    } else {
                        break;
                    }
                }
                Token::Ident(input[pos..end].to_lowercase())
            }
            _ => return Err(ParseError::at("unknown character", pos, c.to_string())),
        };
        tokens.push(Spanned { token, pos });
    }
    Ok(tokens)
}

// Returns the end offset of the number starting at `start`. The exponent marker is only
// consumed when at least one digit follows it, so `2e` stays `2` followed by `e`.
fn scan_number(chars: &mut Peekable<CharIndices>, start: usize) -> usize {
    let mut end = start;
    let mut has_dot = false;

    while let Some(&(i, ch)) = chars.peek() {
        match ch {
            '.' if has_dot => break,
            '.' => has_dot = true,
            '0'..='9' => {}
            _ => break,
        }
        end = i + 1;
        chars.next();
    }

    if let Some(&(_, 'e' | 'E')) = chars.peek() {
        let mut ahead = chars.clone();
        ahead.next();
        if let Some(&(_, '+' | '-')) = ahead.peek() {
            ahead.next();
        }
        let mut exp_end = None;
        while let Some(&(i, d)) = ahead.peek() {
            if !d.is_ascii_digit() {
                break;
            }
            exp_end = Some(i + 1);
            ahead.next();
        }
        if let Some(e) = exp_end {
            end = e;
            *chars = ahead;
        }
    }
    end
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Func1 {
    Sin,
    Cos,
    Tan,
    Asin,
    Acos,
    Atan,
    Sinh,
    Cosh,
    Tanh,
    Asinh,
    Acosh,
    Atanh,
    Exp,
    Log,
    Log10,
    Sqrt,
    Cbrt,
    Floor,
    Ceil,
    Round,
    Abs,
}

impl Func1 {
    pub const ALL: [Func1; 21] = [
        Func1::Sin,
        Func1::Cos,
        Func1::Tan,
        Func1::Asin,
        Func1::Acos,
        Func1::Atan,
        Func1::Sinh,
        Func1::Cosh,
        Func1::Tanh,
        Func1::Asinh,
        Func1::Acosh,
        Func1::Atanh,
        Func1::Exp,
        Func1::Log,
        Func1::Log10,
        Func1::Sqrt,
        Func1::Cbrt,
        Func1::Floor,
        Func1::Ceil,
        Func1::Round,
        Func1::Abs,
    ];

    pub fn name(self) -> &'static str {
        match self {
            Func1::Sin => "sin",
            Func1::Cos => "cos",
            Func1::Tan => "tan",
            Func1::Asin => "asin",
            Func1::Acos => "acos",
            Func1::Atan => "atan",
            Func1::Sinh => "sinh",
            Func1::Cosh => "cosh",
            Func1::Tanh => "tanh",
            Func1::Asinh => "asinh",
            Func1::Acosh => "acosh",
            Func1::Atanh => "atanh",
            Func1::Exp => "exp",
            Func1::Log => "log",
            Func1::Log10 => "log10",
            Func1::Sqrt => "sqrt",
            Func1::Cbrt => "cbrt",
            Func1::Floor => "floor",
            Func1::Ceil => "ceil",
            Func1::Round => "round",
            Func1::Abs => "abs",
        }
    }

    /// Out-of-domain arguments produce NaN, exactly as the `f64` methods do.
    pub fn apply(self, v: f64) -> f64 {
        match self {
            Func1::Sin => v.sin(),
            Func1::Cos => v.cos(),
            Func1::Tan => v.tan(),
            Func1::Asin => v.asin(),
            Func1::Acos => v.acos(),
            Func1::Atan => v.atan(),
            Func1::Sinh => v.sinh(),
            Func1::Cosh => v.cosh(),
            Func1::Tanh => v.tanh(),
            Func1::Asinh => v.asinh(),
            Func1::Acosh => v.acosh(),
            Func1::Atanh => v.atanh(),
            Func1::Exp => v.exp(),
            Func1::Log => v.ln(),
            Func1::Log10 => v.log10(),
            Func1::Sqrt => v.sqrt(),
            Func1::Cbrt => v.cbrt(),
            Func1::Floor => v.floor(),
            Func1::Ceil => v.ceil(),
            Func1::Round => v.round(),
            Func1::Abs => v.abs(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Func2 {
    Pow,
    Min,
    Max,
}

impl Func2 {
    pub const ALL: [Func2; 3] = [Func2::Pow, Func2::Min, Func2::Max];

    pub fn name(self) -> &'static str {
        match self {
            Func2::Pow => "pow",
            Func2::Min => "min",
            Func2::Max => "max",
        }
    }

    pub fn apply(self, a: f64, b: f64) -> f64 {
        match self {
            Func2::Pow => a.powf(b),
            Func2::Min => a.min(b),
            Func2::Max => a.max(b),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Builtin {
    Unary(Func1),
    Binary(Func2),
}

impl Builtin {
    pub fn arity(self) -> usize {
        match self {
            Builtin::Unary(_) => 1,
            Builtin::Binary(_) => 2,
        }
    }
}

/// Read-only names an expression may refer to besides `x`.
#[derive(Debug, Clone)]
pub struct SymbolTable {
    constants: HashMap<&'static str, f64>,
    functions: HashMap<&'static str, Builtin>,
}

impl SymbolTable {
    pub fn standard() -> Self {
        let constants = HashMap::from([("pi", PI), ("e", E)]);

        let mut functions = HashMap::new();
        for f in Func1::ALL {
            functions.insert(f.name(), Builtin::Unary(f));
        }
        for f in Func2::ALL {
            functions.insert(f.name(), Builtin::Binary(f));
        }
        functions.insert("ln", Builtin::Unary(Func1::Log));

        SymbolTable { constants, functions }
    }

    pub fn constant(&self, name: &str) -> Option<(&'static str, f64)> {
        self.constants.get_key_value(name).map(|(k, v)| (*k, *v))
    }

    pub fn function(&self, name: &str) -> Option<Builtin> {
        self.functions.get(name).copied()
    }

    pub fn is_function(&self, name: &str) -> bool {
        self.functions.contains_key(name)
    }
}

impl Default for SymbolTable {
    fn default() -> Self {
        SymbolTable::standard()
    }
}

/// The single binding an expression is evaluated against.
///
/// Each caller owns its context; evaluating one compiled [`Expression`] from several places at
/// once only requires one context per caller.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct EvaluationContext {
    x: f64,
}

impl EvaluationContext {
    pub fn new() -> Self {
        EvaluationContext::default()
    }

    pub fn with_x(x: f64) -> Self {
        EvaluationContext { x }
    }

    pub fn bind(&mut self, x: f64) {
        self.x = x;
    }

    pub fn x(&self) -> f64 {
        self.x
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum BinOp {
    Add,
    Sub,
    Mul,
    Div,
    Rem,
    Pow,
}

impl BinOp {
    fn from_char(c: char) -> Option<BinOp> {
        match c {
            '+' => Some(BinOp::Add),
            '-' => Some(BinOp::Sub),
            '*' => Some(BinOp::Mul),
            '/' => Some(BinOp::Div),
            '%' => Some(BinOp::Rem),
            '^' => Some(BinOp::Pow),
            _ => None,
        }
    }

    fn symbol(self) -> char {
        match self {
            BinOp::Add => '+',
            BinOp::Sub => '-',
            BinOp::Mul => '*',
            BinOp::Div => '/',
            BinOp::Rem => '%',
            BinOp::Pow => '^',
        }
    }

    fn apply(self, l: f64, r: f64) -> f64 {
        match self {
            BinOp::Add => l + r,
            BinOp::Sub => l - r,
            BinOp::Mul => l * r,
            BinOp::Div => l / r,
            BinOp::Rem => l % r,
            BinOp::Pow => l.powf(r),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
enum Node {
    Number(f64),
    Constant(&'static str, f64),
    Var,
    Neg(Box<Node>),
    Binary(BinOp, Box<Node>, Box<Node>),
    Call1(Func1, Box<Node>),
    Call2(Func2, Box<Node>, Box<Node>),
}

impl Node {
    fn eval(&self, x: f64) -> f64 {
        match self {
            Node::Number(n) | Node::Constant(_, n) => *n,
            Node::Var => x,
            Node::Neg(inner) => -inner.eval(x),
            Node::Binary(op, l, r) => op.apply(l.eval(x), r.eval(x)),
            Node::Call1(f, a) => f.apply(a.eval(x)),
            Node::Call2(f, a, b) => f.apply(a.eval(x), b.eval(x)),
        }
    }

    fn eval_traced(&self, x: f64, trace: &mut EvaluationTrace) -> f64 {
        match self {
            Node::Number(n) => *n,
            Node::Constant(name, n) => {
                trace.add_step(name.to_string(), *n);
                *n
            }
            Node::Var => {
                trace.add_step("x".to_string(), x);
                x
            }
            Node::Neg(inner) => {
                let v = inner.eval_traced(x, trace);
                let result = -v;
                trace.add_step(format!("-({})", v), result);
                result
            }
            Node::Binary(op, l, r) => {
                let left = l.eval_traced(x, trace);
                let right = r.eval_traced(x, trace);
                let result = op.apply(left, right);
                trace.add_step(format!("{} {} {}", left, op.symbol(), right), result);
                result
            }
            Node::Call1(f, a) => {
                let arg = a.eval_traced(x, trace);
                let result = f.apply(arg);
                trace.add_step(format!("{}({})", f.name(), arg), result);
                result
            }
            Node::Call2(f, a, b) => {
                let first = a.eval_traced(x, trace);
                let second = b.eval_traced(x, trace);
                let result = f.apply(first, second);
                trace.add_step(format!("{}({}, {})", f.name(), first, second), result);
                result
            }
        }
    }
}

/// A compiled expression in the single variable `x`.
///
/// The tree is built once by [`Engine::compile`] and never changes; evaluating it at a new `x`
/// only walks the tree.
#[derive(Debug, Clone, PartialEq)]
pub struct Expression {
    source: String,
    root: Node,
    uses_x: bool,
}

impl Expression {
    pub fn source(&self) -> &str {
        &self.source
    }

    pub fn free_variables(&self) -> Vec<&'static str> {
        if self.uses_x {
            vec!["x"]
        } else {
            Vec::new()
        }
    }

    pub fn eval_in(&self, ctx: &EvaluationContext) -> f64 {
        self.root.eval(ctx.x)
    }

    pub fn evaluate(&self, x: f64) -> f64 {
        self.eval_in(&EvaluationContext::with_x(x))
    }

    /// Evaluates like [`Expression::eval_in`], recording every intermediate operation.
    pub fn eval_traced(&self, ctx: &EvaluationContext, trace: &mut EvaluationTrace) -> f64 {
        self.root.eval_traced(ctx.x, trace)
    }
}

pub struct Engine {
    symbols: SymbolTable,
}

impl Engine {
    pub fn new() -> Self {
        Engine {
            symbols: SymbolTable::standard(),
        }
    }

    pub fn symbols(&self) -> &SymbolTable {
        &self.symbols
    }

    pub fn compile(&self, source: &str) -> Result<Expression, ParseError> {
        let tokens = tokenize(source)?;
        if tokens.is_empty() {
            return Err(ParseError::new("empty expression"));
        }
        let token_count = tokens.len();

        let mut parser = Parser::new(tokens, &self.symbols, source.len());
        let root = parser.parse()?;
        log::debug!("compiled '{}' ({} tokens)", source, token_count);

        Ok(Expression {
            source: source.to_string(),
            root,
            uses_x: parser.uses_x,
        })
    }
}

impl Default for Engine {
    fn default() -> Self {
        Engine::new()
    }
}

/// The engine with the standard symbol table, built on first use.
pub fn engine() -> &'static Engine {
    static ENGINE: OnceLock<Engine> = OnceLock::new();
    ENGINE.get_or_init(Engine::new)
}

pub fn compile(source: &str) -> Result<Expression, ParseError> {
    engine().compile(source)
}

pub fn evaluate(expr: &Expression, x: f64) -> f64 {
    expr.evaluate(x)
}

/// Deepest nesting of parentheses, signs and exponents `compile` accepts.
pub const MAX_NESTING: usize = 256;

struct Parser<'a> {
    tokens: Vec<Spanned>,
    current: usize,
    symbols: &'a SymbolTable,
    source_len: usize,
    uses_x: bool,
    depth: usize,
}

impl<'a> Parser<'a> {
    fn new(tokens: Vec<Spanned>, symbols: &'a SymbolTable, source_len: usize) -> Self {
        Parser {
            tokens,
            current: 0,
            symbols,
            source_len,
            uses_x: false,
            depth: 0,
        }
    }

    fn parse(&mut self) -> Result<Node, ParseError> {
        let root = self.expr()?;
        if let Some(spanned) = self.tokens.get(self.current) {
            let message = match spanned.token {
                Token::RParen => "unbalanced parentheses: unexpected ')'",
                _ => "unexpected token after end of expression",
            };
            return Err(ParseError::at(message, spanned.pos, spanned.token.text()));
        }
        Ok(root)
    }

    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.current).map(|s| &s.token)
    }

    fn peek_op(&self) -> Option<BinOp> {
        match self.peek() {
            Some(Token::Op(c)) => BinOp::from_char(*c),
            _ => None,
        }
    }

    fn expr(&mut self) -> Result<Node, ParseError> {
        let mut left = self.term()?;

        while let Some(op @ (BinOp::Add | BinOp::Sub)) = self.peek_op() {
            self.current += 1;
            let right = self.term()?;
            left = Node::Binary(op, Box::new(left), Box::new(right));
        }
        Ok(left)
    }

    fn term(&mut self) -> Result<Node, ParseError> {
        let mut left = self.power()?;

        while let Some(op @ (BinOp::Mul | BinOp::Div | BinOp::Rem)) = self.peek_op() {
            self.current += 1;
            let right = self.power()?;
            left = Node::Binary(op, Box::new(left), Box::new(right));
        }
        Ok(left)
    }

    // Right-associative: the exponent is parsed by recursing into `power`.
    fn power(&mut self) -> Result<Node, ParseError> {
        let base = self.unary()?;

        if self.peek_op() == Some(BinOp::Pow) {
            self.current += 1;
            let exponent = self.nested(Self::power)?;
            Ok(Node::Binary(BinOp::Pow, Box::new(base), Box::new(exponent)))
        } else {
            Ok(base)
        }
    }

    // Runs one recursive production, bounding how deep the recursion may go.
    fn nested(&mut self, parse: fn(&mut Self) -> Result<Node, ParseError>) -> Result<Node, ParseError> {
        if self.depth >= MAX_NESTING {
            let (pos, token) = match self.tokens.get(self.current) {
                Some(spanned) => (spanned.pos, spanned.token.text()),
                None => (self.source_len, String::new()),
            };
            return Err(ParseError::at("expression nested too deeply", pos, token));
        }
        self.depth += 1;
        let node = parse(self);
        self.depth -= 1;
        node
    }

    fn unary(&mut self) -> Result<Node, ParseError> {
        self.nested(Self::signed)
    }

    fn signed(&mut self) -> Result<Node, ParseError> {
        match self.peek() {
            Some(Token::Op('-')) => {
                self.current += 1;
                Ok(Node::Neg(Box::new(self.unary()?)))
            }
            Some(Token::Op('+')) => {
                self.current += 1;
                self.unary()
            }
            _ => self.primary(),
        }
    }

    fn primary(&mut self) -> Result<Node, ParseError> {
        let Some(spanned) = self.tokens.get(self.current).cloned() else {
            return Err(ParseError {
                message: "unexpected end of expression".to_string(),
                position: Some(self.source_len),
                token: None,
            });
        };
        self.current += 1;

        match spanned.token {
            Token::Number(n) => Ok(Node::Number(n)),
            Token::LParen => {
                let inner = self.expr()?;
                self.expect_closing(spanned.pos)?;
                Ok(inner)
            }
            Token::Ident(name) => self.identifier(&name, spanned.pos),
            Token::Op(c) => Err(ParseError::at("dangling operator", spanned.pos, c.to_string())),
            Token::RParen => Err(ParseError::at(
                "unbalanced parentheses: unexpected ')'",
                spanned.pos,
                ")",
            )),
            Token::Comma => Err(ParseError::at("unexpected ','", spanned.pos, ",")),
        }
    }

    fn identifier(&mut self, name: &str, pos: usize) -> Result<Node, ParseError> {
        let called = self.peek() == Some(&Token::LParen);

        if name == "x" {
            if called {
                return Err(ParseError::at("'x' is a variable, not a function", pos, name));
            }
            self.uses_x = true;
            return Ok(Node::Var);
        }

        if let Some((constant, value)) = self.symbols.constant(name) {
            if called {
                return Err(ParseError::at("constant cannot be called", pos, name));
            }
            return Ok(Node::Constant(constant, value));
        }

        let Some(builtin) = self.symbols.function(name) else {
            return Err(ParseError::at("unknown identifier", pos, name));
        };
        if !called {
            return Err(ParseError::at("function requires parentheses", pos, name));
        }
        let open_pos = self.tokens[self.current].pos;
        self.current += 1;

        let mut args = Vec::new();
        if self.peek() != Some(&Token::RParen) {
            loop {
                args.push(self.expr()?);
                match self.peek() {
                    Some(Token::Comma) => self.current += 1,
                    _ => break,
                }
            }
        }
        self.expect_closing(open_pos)?;

        if args.len() != builtin.arity() {
            return Err(ParseError::at(
                format!(
                    "wrong number of arguments: expected {}, found {}",
                    builtin.arity(),
                    args.len()
                ),
                pos,
                name,
            ));
        }

        let mut args = args.into_iter().map(Box::new);
        let node = match (builtin, args.next(), args.next()) {
            (Builtin::Unary(f), Some(a), None) => Node::Call1(f, a),
            (Builtin::Binary(f), Some(a), Some(b)) => Node::Call2(f, a, b),
            _ => unreachable!("arity checked above"),
        };
        Ok(node)
    }

    fn expect_closing(&mut self, open_pos: usize) -> Result<(), ParseError> {
        match self.tokens.get(self.current) {
            Some(Spanned { token: Token::RParen, .. }) => {
                self.current += 1;
                Ok(())
            }
            Some(spanned) => Err(ParseError::at(
                "expected ',' or ')'",
                spanned.pos,
                spanned.token.text(),
            )),
            None => Err(ParseError::at(
                "unbalanced parentheses: missing ')'",
                open_pos,
                "(",
            )),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;
    use pretty_assertions::assert_eq;

    fn eval(source: &str, x: f64) -> f64 {
        compile(source).unwrap().evaluate(x)
    }

    #[test]
    fn constant_arithmetic() {
        let expr = compile("2+2").unwrap();
        assert_eq!(evaluate(&expr, 0.0), 4.0);
    }

    #[test]
    fn square_of_x() {
        let expr = compile("x^2").unwrap();
        assert_eq!(expr.evaluate(3.0), 9.0);
        assert_eq!(expr.evaluate(-3.0), 9.0);
        assert_eq!(expr.free_variables(), vec!["x"]);
    }

    #[test]
    fn precedence() {
        assert_eq!(eval("2+3*4", 0.0), 14.0);
        assert_eq!(eval("(2+3)*4", 0.0), 20.0);
        assert_eq!(eval("2*3^2", 0.0), 18.0);
        assert_eq!(eval("10-4-3", 0.0), 3.0);
        assert_eq!(eval("48/4/2", 0.0), 6.0);
        assert_eq!(eval("7%4", 0.0), 3.0);
    }

    #[test]
    fn power_is_right_associative() {
        assert_eq!(eval("2^3^2", 0.0), 512.0);
    }

    #[test]
    fn unary_minus_binds_tighter_than_power() {
        assert_eq!(eval("-2^2", 0.0), 4.0);
        assert_eq!(eval("2^-1", 0.0), 0.5);
        assert_eq!(eval("--3", 0.0), 3.0);
        assert_eq!(eval("+3", 0.0), 3.0);
    }

    #[test]
    fn deep_nesting_is_a_parse_error() {
        let parens = format!("{}1{}", "(".repeat(10_000), ")".repeat(10_000));
        let signs = format!("{}1", "-".repeat(10_000));
        let powers = format!("{}2", "2^".repeat(10_000));
        let calls = format!("{}x{}", "sin(".repeat(10_000), ")".repeat(10_000));
        for source in [parens, signs, powers, calls] {
            let err = compile(&source).unwrap_err();
            assert_eq!(err.message, "expression nested too deeply");
            assert!(err.position.is_some());
        }
    }

    #[test]
    fn moderate_nesting_still_compiles() {
        let depth = MAX_NESTING / 4;
        let source = format!("{}x{}", "(".repeat(depth), ")".repeat(depth));
        assert_eq!(eval(&source, 3.0), 3.0);
        assert_eq!(eval(&format!("{}1", "-".repeat(depth * 2)), 0.0), 1.0);
        assert_eq!(eval(&format!("{}2", "1^".repeat(depth)), 0.0), 1.0);
    }

    #[test]
    fn functions_and_constants() {
        assert_abs_diff_eq!(eval("sin(pi/2)", 0.0), 1.0, epsilon = 1e-12);
        assert_abs_diff_eq!(eval("log(e)", 0.0), 1.0, epsilon = 1e-12);
        assert_abs_diff_eq!(eval("ln(e^2)", 0.0), 2.0, epsilon = 1e-12);
        assert_eq!(eval("log10(1000)", 0.0), 3.0);
        assert_eq!(eval("cbrt(-27)", 0.0), -3.0);
        assert_eq!(eval("pow(2, 10)", 0.0), 1024.0);
        assert_eq!(eval("min(3, x)", -1.0), -1.0);
        assert_eq!(eval("max(3, x)", -1.0), 3.0);
        assert_eq!(eval("round(2.5) + floor(-1.5) + ceil(1.2) + abs(-4)", 0.0), 3.0 - 2.0 + 2.0 + 4.0);
        assert_abs_diff_eq!(eval("5+4*8-sin(pi/2)+pow(2,3)", 0.0), 44.0, epsilon = 1e-12);
    }

    #[test]
    fn identifiers_are_case_insensitive() {
        assert_abs_diff_eq!(eval("SIN(PI)", 0.0), 0.0, epsilon = 1e-12);
        assert_eq!(eval("X*2", 4.0), 8.0);
    }

    #[test]
    fn scientific_notation() {
        assert_eq!(eval("1.5e3", 0.0), 1500.0);
        assert_eq!(eval("2E-2", 0.0), 0.02);
        assert_abs_diff_eq!(eval("2*e", 0.0), 2.0 * E, epsilon = 1e-12);
    }

    #[test]
    fn ieee_outcomes_are_not_errors() {
        assert_eq!(eval("1/0", 0.0), f64::INFINITY);
        assert_eq!(eval("-1/0", 0.0), f64::NEG_INFINITY);
        assert!(eval("0/0", 0.0).is_nan());
        assert!(eval("sqrt(x)", -1.0).is_nan());
        assert!(eval("log(x)", -1.0).is_nan());
        assert_eq!(eval("log(x)", 0.0), f64::NEG_INFINITY);
        assert!(eval("asin(2)", 0.0).is_nan());
    }

    #[test]
    fn compilation_is_deterministic() {
        for source in ["x^2 - 3*x + 1", "sin(x)/x", "pow(x, 0.5) + atan(x)"] {
            let a = compile(source).unwrap();
            let b = compile(source).unwrap();
            for x in [-2.5, 0.0, 0.1, 7.0] {
                assert_eq!(a.evaluate(x).to_bits(), b.evaluate(x).to_bits());
            }
        }
    }

    #[test]
    fn context_rebinding_reuses_compiled_tree() {
        let expr = compile("x*x+1").unwrap();
        let mut ctx = EvaluationContext::new();
        let mut values = Vec::new();
        for i in 0..4 {
            ctx.bind(i as f64);
            values.push(expr.eval_in(&ctx));
        }
        assert_eq!(values, vec![1.0, 2.0, 5.0, 10.0]);
        assert_eq!(expr.source(), "x*x+1");
    }

    #[test]
    fn constant_expression_has_no_free_variables() {
        assert!(compile("pi*2").unwrap().free_variables().is_empty());
    }

    #[test]
    fn dangling_operator() {
        let err = compile("2+*3").unwrap_err();
        assert_eq!(err.message, "dangling operator");
        assert_eq!(err.position, Some(2));
        assert_eq!(err.token.as_deref(), Some("*"));

        let err = compile("2+").unwrap_err();
        assert_eq!(err.message, "unexpected end of expression");
        assert_eq!(err.position, Some(2));
    }

    #[test]
    fn unknown_identifier() {
        let err = compile("1 + foo(2)").unwrap_err();
        assert_eq!(err.message, "unknown identifier");
        assert_eq!(err.position, Some(4));
        assert_eq!(err.token.as_deref(), Some("foo"));
        assert!(compile("y + 1").is_err());
    }

    #[test]
    fn unbalanced_parentheses() {
        let err = compile("(1+2").unwrap_err();
        assert_eq!(err.message, "unbalanced parentheses: missing ')'");
        assert_eq!(err.position, Some(0));

        let err = compile("1+2)").unwrap_err();
        assert_eq!(err.message, "unbalanced parentheses: unexpected ')'");
        assert_eq!(err.position, Some(3));

        assert!(compile("sin(1").is_err());
        assert!(compile("()").is_err());
    }

    #[test]
    fn wrong_arity() {
        let err = compile("sin(1, 2)").unwrap_err();
        assert_eq!(err.message, "wrong number of arguments: expected 1, found 2");
        assert_eq!(err.token.as_deref(), Some("sin"));
        assert!(compile("pow(2)").is_err());
        assert!(compile("max()").is_err());
    }

    #[test]
    fn misuse_of_names() {
        assert!(compile("sin").is_err());
        assert!(compile("pi(2)").is_err());
        assert!(compile("x(2)").is_err());
        assert!(compile("2x").is_err());
        assert!(compile("2e").is_err());
    }

    #[test]
    fn empty_and_invalid_characters() {
        assert_eq!(compile("   ").unwrap_err().message, "empty expression");
        let err = compile("2 $ 3").unwrap_err();
        assert_eq!(err.message, "unknown character");
        assert_eq!(err.position, Some(2));
        assert!(compile("1..2").is_err());
    }

    #[test]
    fn trace_records_each_operation() {
        let expr = compile("2*3+pi").unwrap();
        let mut trace = EvaluationTrace::new(true);
        let result = expr.eval_traced(&EvaluationContext::new(), &mut trace);

        assert_eq!(result, expr.evaluate(0.0));
        let ops: Vec<&str> = trace.steps.iter().map(|s| s.operation.as_str()).collect();
        let last = format!("6 + {}", PI);
        assert_eq!(ops, vec!["2 * 3", "pi", last.as_str()]);
    }

    #[test]
    fn trace_disabled_records_nothing() {
        let expr = compile("sqrt(16)").unwrap();
        let mut trace = EvaluationTrace::new(false);
        assert_eq!(expr.eval_traced(&EvaluationContext::new(), &mut trace), 4.0);
        assert!(trace.steps.is_empty());
    }

    #[test]
    fn tokenizer_reports_offsets() {
        let tokens = tokenize("sin( 2.5 )").unwrap();
        let positions: Vec<usize> = tokens.iter().map(|t| t.pos).collect();
        assert_eq!(positions, vec![0, 3, 5, 9]);
        assert_eq!(tokens[2].token, Token::Number(2.5));
    }
}
