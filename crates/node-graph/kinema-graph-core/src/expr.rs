//! The embedded expression mini-language.
//!
//! A recursive-descent front end for the expression node: `Expr::parse` is
//! the edit-time validity check (parse only, no evaluation, no side effects),
//! `Expr::eval` the run-time evaluator. The evaluator is a hard sandbox: it
//! sees exactly the named input bindings passed to it and the whitelisted
//! pure helpers in the [`FnRegistry`]: no ambient process state, no module
//! or filesystem access. Expression text is end-user-authored, so this
//! boundary is a security requirement rather than a style choice.
//!
//! # Syntax
//!
//! ```text
//! // Variables: any identifier; resolved against the node's named inputs
//! // at evaluation time. Unknown names are an evaluation error, not a
//! // syntax error, because the input schema is dynamic.
//! a, b, translation
//! pi, e            // constants
//!
//! // Operators (precedence low to high)
//! a + b, a - b     // addition, subtraction
//! a * b, a / b     // multiplication, division
//! a ^ b            // exponentiation (right associative)
//! -a               // negation
//!
//! // Whitelisted functions
//! sin(x), cos(x), tan(x), sqrt(x), abs(x), floor(x), ceil(x)
//! min(a, b), max(a, b), clamp(x, lo, hi), lerp(a, b, t)
//! ```

use hashbrown::HashMap;
use kinema_api_core::Value;
use std::f32::consts::{E, PI};
use std::sync::Arc;
use thiserror::Error;

/// Named input values visible to an evaluation.
pub type Bindings = HashMap<String, Value>;

// ============================================================================
// Errors
// ============================================================================

#[derive(Debug, Error, Clone, PartialEq)]
pub enum ParseError {
    #[error("unexpected character: '{0}'")]
    UnexpectedChar(char),
    #[error("unexpected end of expression")]
    UnexpectedEnd,
    #[error("unexpected token: '{0}'")]
    UnexpectedToken(String),
    #[error("invalid number: '{0}'")]
    InvalidNumber(String),
}

#[derive(Debug, Error, Clone, PartialEq)]
pub enum EvalError {
    #[error("unknown variable: '{0}'")]
    UnknownVariable(String),
    #[error("unknown function: '{0}'")]
    UnknownFunction(String),
    #[error("function '{func}' expects {expected} args, got {got}")]
    WrongArgCount {
        func: String,
        expected: usize,
        got: usize,
    },
    #[error("division by zero")]
    DivisionByZero,
    #[error("operator '{op}' cannot be applied to these operand types")]
    TypeMismatch { op: &'static str },
    #[error("function arguments must be scalar numbers")]
    NonScalarArgument,
}

// ============================================================================
// Whitelisted helper functions
// ============================================================================

/// A pure helper callable from expressions. The whitelist is the only
/// capability the evaluator exposes beyond the input bindings.
pub trait ExprFn: Send + Sync {
    fn name(&self) -> &str;
    fn arg_count(&self) -> usize;
    fn call(&self, args: &[f32]) -> f32;
}

/// Registry of whitelisted expression functions.
#[derive(Clone, Default)]
pub struct FnRegistry {
    funcs: HashMap<String, Arc<dyn ExprFn>>,
}

impl FnRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register<F: ExprFn + 'static>(&mut self, func: F) {
        self.funcs.insert(func.name().to_string(), Arc::new(func));
    }

    pub fn get(&self, name: &str) -> Option<&Arc<dyn ExprFn>> {
        self.funcs.get(name)
    }

    /// The standard whitelist: pure scalar math only.
    pub fn standard() -> Self {
        let mut registry = FnRegistry::new();
        registry.register(FnSin);
        registry.register(FnCos);
        registry.register(FnTan);
        registry.register(FnSqrt);
        registry.register(FnAbs);
        registry.register(FnFloor);
        registry.register(FnCeil);
        registry.register(FnMin);
        registry.register(FnMax);
        registry.register(FnClamp);
        registry.register(FnLerp);
        registry
    }
}

macro_rules! define_fn {
    ($name:ident, $str_name:literal, $args:literal, |$($arg:ident),*| $body:expr) => {
        pub struct $name;

        impl ExprFn for $name {
            fn name(&self) -> &str { $str_name }
            fn arg_count(&self) -> usize { $args }
            fn call(&self, args: &[f32]) -> f32 {
                let [$($arg),*] = args else { return 0.0 };
                $body
            }
        }
    };
}

define_fn!(FnSin, "sin", 1, |a| a.sin());
define_fn!(FnCos, "cos", 1, |a| a.cos());
define_fn!(FnTan, "tan", 1, |a| a.tan());
define_fn!(FnSqrt, "sqrt", 1, |a| a.sqrt());
define_fn!(FnAbs, "abs", 1, |a| a.abs());
define_fn!(FnFloor, "floor", 1, |a| a.floor());
define_fn!(FnCeil, "ceil", 1, |a| a.ceil());
define_fn!(FnMin, "min", 2, |a, b| a.min(*b));
define_fn!(FnMax, "max", 2, |a, b| a.max(*b));
define_fn!(FnClamp, "clamp", 3, |x, lo, hi| x.clamp(*lo, *hi));
define_fn!(FnLerp, "lerp", 3, |a, b, t| a + (b - a) * t);

// ============================================================================
// Lexer
// ============================================================================

#[derive(Debug, Clone, PartialEq)]
enum Token {
    Number(f32),
    Ident(String),
    Plus,
    Minus,
    Star,
    Slash,
    Caret,
    LParen,
    RParen,
    Comma,
    Eof,
}

struct Lexer<'a> {
    input: &'a str,
    pos: usize,
}

impl<'a> Lexer<'a> {
    fn new(input: &'a str) -> Self {
        Self { input, pos: 0 }
    }

    fn peek_char(&self) -> Option<char> {
        self.input[self.pos..].chars().next()
    }

    fn next_char(&mut self) -> Option<char> {
        let c = self.peek_char()?;
        self.pos += c.len_utf8();
        Some(c)
    }

    fn skip_whitespace(&mut self) {
        while let Some(c) = self.peek_char() {
            if c.is_whitespace() {
                self.next_char();
            } else {
                break;
            }
        }
    }

    fn read_number(&mut self) -> Result<f32, ParseError> {
        let start = self.pos;
        while let Some(c) = self.peek_char() {
            if c.is_ascii_digit() || c == '.' {
                self.next_char();
            } else {
                break;
            }
        }
        let s = &self.input[start..self.pos];
        s.parse()
            .map_err(|_| ParseError::InvalidNumber(s.to_string()))
    }

    fn read_ident(&mut self) -> String {
        let start = self.pos;
        while let Some(c) = self.peek_char() {
            if c.is_alphanumeric() || c == '_' {
                self.next_char();
            } else {
                break;
            }
        }
        self.input[start..self.pos].to_string()
    }

    fn next_token(&mut self) -> Result<Token, ParseError> {
        self.skip_whitespace();

        let Some(c) = self.peek_char() else {
            return Ok(Token::Eof);
        };

        match c {
            '+' => {
                self.next_char();
                Ok(Token::Plus)
            }
            '-' => {
                self.next_char();
                Ok(Token::Minus)
            }
            '*' => {
                self.next_char();
                Ok(Token::Star)
            }
            '/' => {
                self.next_char();
                Ok(Token::Slash)
            }
            '^' => {
                self.next_char();
                Ok(Token::Caret)
            }
            '(' => {
                self.next_char();
                Ok(Token::LParen)
            }
            ')' => {
                self.next_char();
                Ok(Token::RParen)
            }
            ',' => {
                self.next_char();
                Ok(Token::Comma)
            }
            '0'..='9' | '.' => Ok(Token::Number(self.read_number()?)),
            'a'..='z' | 'A'..='Z' | '_' => Ok(Token::Ident(self.read_ident())),
            _ => Err(ParseError::UnexpectedChar(c)),
        }
    }
}

// ============================================================================
// AST
// ============================================================================

#[derive(Debug, Clone)]
pub enum Ast {
    Num(f32),
    Var(String),
    BinOp(BinOp, Box<Ast>, Box<Ast>),
    Neg(Box<Ast>),
    Call(String, Vec<Ast>),
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum BinOp {
    Add,
    Sub,
    Mul,
    Div,
    Pow,
}

impl BinOp {
    fn symbol(self) -> &'static str {
        match self {
            BinOp::Add => "+",
            BinOp::Sub => "-",
            BinOp::Mul => "*",
            BinOp::Div => "/",
            BinOp::Pow => "^",
        }
    }
}

// ============================================================================
// Parser
// ============================================================================

struct Parser<'a> {
    lexer: Lexer<'a>,
    current: Token,
}

impl<'a> Parser<'a> {
    fn new(input: &'a str) -> Result<Self, ParseError> {
        let mut lexer = Lexer::new(input);
        let current = lexer.next_token()?;
        Ok(Self { lexer, current })
    }

    fn advance(&mut self) -> Result<(), ParseError> {
        self.current = self.lexer.next_token()?;
        Ok(())
    }

    fn expect(&mut self, expected: Token) -> Result<(), ParseError> {
        if self.current == expected {
            self.advance()
        } else {
            Err(ParseError::UnexpectedToken(format!("{:?}", self.current)))
        }
    }

    fn parse_expr(&mut self) -> Result<Ast, ParseError> {
        self.parse_add_sub()
    }

    fn parse_add_sub(&mut self) -> Result<Ast, ParseError> {
        let mut left = self.parse_mul_div()?;

        loop {
            let op = match &self.current {
                Token::Plus => BinOp::Add,
                Token::Minus => BinOp::Sub,
                _ => break,
            };
            self.advance()?;
            let right = self.parse_mul_div()?;
            left = Ast::BinOp(op, Box::new(left), Box::new(right));
        }

        Ok(left)
    }

    fn parse_mul_div(&mut self) -> Result<Ast, ParseError> {
        let mut left = self.parse_power()?;

        loop {
            let op = match &self.current {
                Token::Star => BinOp::Mul,
                Token::Slash => BinOp::Div,
                _ => break,
            };
            self.advance()?;
            let right = self.parse_power()?;
            left = Ast::BinOp(op, Box::new(left), Box::new(right));
        }

        Ok(left)
    }

    fn parse_power(&mut self) -> Result<Ast, ParseError> {
        let base = self.parse_unary()?;

        if self.current == Token::Caret {
            self.advance()?;
            let exp = self.parse_power()?; // right associative
            Ok(Ast::BinOp(BinOp::Pow, Box::new(base), Box::new(exp)))
        } else {
            Ok(base)
        }
    }

    fn parse_unary(&mut self) -> Result<Ast, ParseError> {
        if self.current == Token::Minus {
            self.advance()?;
            let inner = self.parse_unary()?;
            Ok(Ast::Neg(Box::new(inner)))
        } else {
            self.parse_primary()
        }
    }

    fn parse_primary(&mut self) -> Result<Ast, ParseError> {
        match &self.current {
            Token::Number(n) => {
                let n = *n;
                self.advance()?;
                Ok(Ast::Num(n))
            }
            Token::Ident(name) => {
                let name = name.clone();
                self.advance()?;

                if self.current == Token::LParen {
                    self.advance()?;
                    let mut args = Vec::new();
                    if self.current != Token::RParen {
                        args.push(self.parse_expr()?);
                        while self.current == Token::Comma {
                            self.advance()?;
                            args.push(self.parse_expr()?);
                        }
                    }
                    self.expect(Token::RParen)?;
                    Ok(Ast::Call(name, args))
                } else {
                    match name.as_str() {
                        "pi" | "PI" => Ok(Ast::Num(PI)),
                        "e" | "E" => Ok(Ast::Num(E)),
                        // The input schema is dynamic, so any other name is
                        // resolved against the bindings at evaluation time.
                        _ => Ok(Ast::Var(name)),
                    }
                }
            }
            Token::LParen => {
                self.advance()?;
                let inner = self.parse_expr()?;
                self.expect(Token::RParen)?;
                Ok(inner)
            }
            Token::Eof => Err(ParseError::UnexpectedEnd),
            _ => Err(ParseError::UnexpectedToken(format!("{:?}", self.current))),
        }
    }
}

// ============================================================================
// Expression
// ============================================================================

/// A parsed expression ready for evaluation.
#[derive(Debug, Clone)]
pub struct Expr {
    ast: Ast,
}

impl Expr {
    /// Parse an expression from a string. Parsing alone; nothing is
    /// evaluated and no names are resolved.
    pub fn parse(input: &str) -> Result<Self, ParseError> {
        let mut parser = Parser::new(input)?;
        let ast = parser.parse_expr()?;
        if parser.current != Token::Eof {
            return Err(ParseError::UnexpectedToken(format!("{:?}", parser.current)));
        }
        Ok(Self { ast })
    }

    /// Whether `input` parses as a single expression.
    pub fn is_valid(input: &str) -> bool {
        Expr::parse(input).is_ok()
    }

    /// Evaluate against the given named bindings and function whitelist.
    pub fn eval(&self, bindings: &Bindings, registry: &FnRegistry) -> Result<Value, EvalError> {
        eval_ast(&self.ast, bindings, registry)
    }
}

fn eval_ast(ast: &Ast, bindings: &Bindings, registry: &FnRegistry) -> Result<Value, EvalError> {
    match ast {
        Ast::Num(n) => Ok(Value::Float(*n)),
        Ast::Var(name) => bindings
            .get(name)
            .cloned()
            .ok_or_else(|| EvalError::UnknownVariable(name.clone())),
        Ast::BinOp(op, l, r) => {
            let l = eval_ast(l, bindings, registry)?;
            let r = eval_ast(r, bindings, registry)?;
            binary(*op, l, r)
        }
        Ast::Neg(inner) => match eval_ast(inner, bindings, registry)? {
            Value::Float(v) => Ok(Value::Float(-v)),
            Value::Vec3([x, y, z]) => Ok(Value::Vec3([-x, -y, -z])),
            _ => Err(EvalError::TypeMismatch { op: "-" }),
        },
        Ast::Call(name, args) => {
            let func = registry
                .get(name)
                .ok_or_else(|| EvalError::UnknownFunction(name.clone()))?;

            if args.len() != func.arg_count() {
                return Err(EvalError::WrongArgCount {
                    func: name.clone(),
                    expected: func.arg_count(),
                    got: args.len(),
                });
            }

            let mut scalars = Vec::with_capacity(args.len());
            for arg in args {
                match eval_ast(arg, bindings, registry)? {
                    Value::Float(v) => scalars.push(v),
                    _ => return Err(EvalError::NonScalarArgument),
                }
            }

            Ok(Value::Float(func.call(&scalars)))
        }
    }
}

fn binary(op: BinOp, l: Value, r: Value) -> Result<Value, EvalError> {
    use Value::{Float, Vec3};
    match (op, l, r) {
        (BinOp::Add, Float(a), Float(b)) => Ok(Float(a + b)),
        (BinOp::Sub, Float(a), Float(b)) => Ok(Float(a - b)),
        (BinOp::Mul, Float(a), Float(b)) => Ok(Float(a * b)),
        (BinOp::Div, Float(a), Float(b)) => {
            if b == 0.0 {
                Err(EvalError::DivisionByZero)
            } else {
                Ok(Float(a / b))
            }
        }
        (BinOp::Pow, Float(a), Float(b)) => Ok(Float(a.powf(b))),

        (BinOp::Add, Vec3(a), Vec3(b)) => Ok(Vec3([a[0] + b[0], a[1] + b[1], a[2] + b[2]])),
        (BinOp::Sub, Vec3(a), Vec3(b)) => Ok(Vec3([a[0] - b[0], a[1] - b[1], a[2] - b[2]])),
        (BinOp::Mul, Vec3(a), Float(s)) | (BinOp::Mul, Float(s), Vec3(a)) => {
            Ok(Vec3([a[0] * s, a[1] * s, a[2] * s]))
        }
        (BinOp::Div, Vec3(a), Float(s)) => {
            if s == 0.0 {
                Err(EvalError::DivisionByZero)
            } else {
                Ok(Vec3([a[0] / s, a[1] / s, a[2] / s]))
            }
        }

        (op, _, _) => Err(EvalError::TypeMismatch { op: op.symbol() }),
    }
}

// ============================================================================
// Tests
// ============================================================================
