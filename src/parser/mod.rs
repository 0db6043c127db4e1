//! PEST-based parser for the binding expression language
//!
//! Produces the AST consumed by the sandbox executor. Grammar lives in
//! `binding.pest`; this module walks the pair tree and builds `Program` nodes.

use pest::iterators::Pair;
use pest::Parser;
use pest_derive::Parser;

pub mod ast;

pub use ast::{BinaryOp, Expr, LValue, MapEntry, PathSeg, Program, Stmt, UnaryOp};


/* ===================== PEST Parser ===================== */

#[derive(Parser)]
#[grammar = "parser/binding.pest"]
struct BindingParser;

/* ===================== Error Type ===================== */

/// Syntax or build failure, with the source location that produced it
#[derive(Debug, Clone, PartialEq)]
pub struct ParseError {
    pub message: String,
    pub line: usize,
    pub column: usize,
}

impl std::fmt::Display for ParseError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "parse error at line {}, column {}: {}",
            self.line, self.column, self.message
        )
    }
}

impl std::error::Error for ParseError {}

impl From<pest::error::Error<Rule>> for ParseError {
    fn from(err: pest::error::Error<Rule>) -> Self {
        let (line, column) = match err.line_col {
            pest::error::LineColLocation::Pos((line, col)) => (line, col),
            pest::error::LineColLocation::Span((line, col), _) => (line, col),
        };
        ParseError {
            message: err.variant.message().to_string(),
            line,
            column,
        }
    }
}

impl ParseError {
    /// Build error anchored at a pair's starting position
    fn at(pair: &Pair<Rule>, message: impl Into<String>) -> Self {
        let (line, column) = pair.as_span().start_pos().line_col();
        ParseError {
            message: message.into(),
            line,
            column,
        }
    }
}

pub type ParseResult<T> = Result<T, ParseError>;

/* ===================== Public API ===================== */

/// Parse a binding script into a program
pub fn parse(source: &str) -> ParseResult<Program> {
    let mut pairs = BindingParser::parse(Rule::program, source)?;
    let program = pairs.next().unwrap();

    let mut body = Vec::new();
    for pair in program.into_inner() {
        match pair.as_rule() {
            Rule::statement => body.push(build_statement(pair)?),
            Rule::EOI => {}
            rule => {
                return Err(ParseError::at(
                    &pair,
                    format!("unexpected program content: {:?}", rule),
                ))
            }
        }
    }

    Ok(Program { body })
}

/* ===================== AST Builder ===================== */

fn build_statement(pair: Pair<Rule>) -> ParseResult<Stmt> {
    // statement = { let_stmt | assign_stmt | expression }
    let inner = pair.into_inner().next().unwrap();
    match inner.as_rule() {
        Rule::let_stmt => {
            // let_stmt = { kw_let ~ identifier ~ assign_op ~ expression }
            let mut parts = inner.into_inner();
            let _kw = parts.next().unwrap();
            let name = parts.next().unwrap().as_str().to_string();
            let _op = parts.next().unwrap();
            let init = build_expression(parts.next().unwrap())?;
            Ok(Stmt::Let { name, init })
        }
        Rule::assign_stmt => {
            // assign_stmt = { lvalue ~ assign_op ~ expression }
            let mut parts = inner.into_inner();
            let target = build_lvalue(parts.next().unwrap())?;
            let _op = parts.next().unwrap();
            let expr = build_expression(parts.next().unwrap())?;
            Ok(Stmt::Assign { target, expr })
        }
        Rule::expression => Ok(Stmt::Expr {
            expr: build_expression(inner)?,
        }),
        rule => Err(ParseError::at(
            &inner,
            format!("unexpected statement rule: {:?}", rule),
        )),
    }
}

fn build_lvalue(pair: Pair<Rule>) -> ParseResult<LValue> {
    // lvalue = { identifier ~ (member_suffix | index_suffix)* }
    let mut parts = pair.into_inner();
    let base = parts.next().unwrap().as_str().to_string();

    let mut path = Vec::new();
    for suffix in parts {
        match suffix.as_rule() {
            Rule::member_suffix => {
                let property = suffix.into_inner().next().unwrap().as_str().to_string();
                path.push(PathSeg::Member { property });
            }
            Rule::index_suffix => {
                let index = build_expression(suffix.into_inner().next().unwrap())?;
                path.push(PathSeg::Index { index });
            }
            rule => {
                return Err(ParseError::at(
                    &suffix,
                    format!("unexpected lvalue suffix: {:?}", rule),
                ))
            }
        }
    }

    Ok(LValue { base, path })
}

fn build_expression(pair: Pair<Rule>) -> ParseResult<Expr> {
    match pair.as_rule() {
        Rule::expression => build_expression(pair.into_inner().next().unwrap()),

        Rule::ternary => {
            // ternary = { logic_or ~ ("?" ~ expression ~ ":" ~ expression)? }
            let mut parts = pair.into_inner();
            let test = build_expression(parts.next().unwrap())?;
            match parts.next() {
                None => Ok(test),
                Some(then_pair) => {
                    let then_e = build_expression(then_pair)?;
                    let else_e = build_expression(parts.next().unwrap())?;
                    Ok(Expr::Ternary {
                        test: Box::new(test),
                        then_e: Box::new(then_e),
                        else_e: Box::new(else_e),
                    })
                }
            }
        }

        Rule::logic_or
        | Rule::logic_and
        | Rule::equality
        | Rule::comparison
        | Rule::additive
        | Rule::multiplicative => build_binary_chain(pair),

        Rule::unary => {
            // unary = { unary_op ~ unary | postfix }
            let mut parts = pair.into_inner();
            let first = parts.next().unwrap();
            if first.as_rule() == Rule::unary_op {
                let op = match first.as_str() {
                    "!" => UnaryOp::Not,
                    "-" => UnaryOp::Neg,
                    other => {
                        return Err(ParseError::at(
                            &first,
                            format!("unknown unary operator '{}'", other),
                        ))
                    }
                };
                let operand = build_expression(parts.next().unwrap())?;
                Ok(Expr::Unary {
                    op,
                    operand: Box::new(operand),
                })
            } else {
                build_expression(first)
            }
        }

        Rule::postfix => {
            // postfix = { primary ~ postfix_suffix* }
            let mut parts = pair.into_inner();
            let mut expr = build_expression(parts.next().unwrap())?;

            // Chain calls, member accesses, and indexing left-to-right
            for suffix in parts {
                let suffix = suffix.into_inner().next().unwrap();
                expr = match suffix.as_rule() {
                    Rule::call_suffix => {
                        let args = match suffix.into_inner().next() {
                            Some(arg_list) => arg_list
                                .into_inner()
                                .map(build_expression)
                                .collect::<ParseResult<Vec<_>>>()?,
                            None => vec![],
                        };
                        Expr::Call {
                            callee: Box::new(expr),
                            args,
                        }
                    }
                    Rule::member_suffix => {
                        let property = suffix.into_inner().next().unwrap().as_str().to_string();
                        Expr::Member {
                            object: Box::new(expr),
                            property,
                        }
                    }
                    Rule::index_suffix => {
                        let index = build_expression(suffix.into_inner().next().unwrap())?;
                        Expr::Index {
                            object: Box::new(expr),
                            index: Box::new(index),
                        }
                    }
                    rule => {
                        return Err(ParseError::at(
                            &suffix,
                            format!("unexpected postfix suffix: {:?}", rule),
                        ))
                    }
                };
            }

            Ok(expr)
        }

        Rule::primary | Rule::literal | Rule::paren_expr => {
            build_expression(pair.into_inner().next().unwrap())
        }

        Rule::identifier => Ok(Expr::Ident {
            name: pair.as_str().to_string(),
        }),

        Rule::null_lit => Ok(Expr::LitNull),

        Rule::boolean => Ok(Expr::LitBool {
            v: pair.as_str() == "true",
        }),

        Rule::number => {
            let num_str = pair.as_str();
            let v = num_str.parse::<f64>().map_err(|e| {
                ParseError::at(&pair, format!("failed to parse number '{}': {}", num_str, e))
            })?;
            Ok(Expr::LitNum { v })
        }

        Rule::string => {
            let inner = pair.into_inner().next().unwrap();
            Ok(Expr::LitStr {
                v: unescape(inner.as_str()),
            })
        }

        Rule::array_lit => {
            let items = pair
                .into_inner()
                .map(build_expression)
                .collect::<ParseResult<Vec<_>>>()?;
            Ok(Expr::List { items })
        }

        Rule::object_lit => {
            let entries = pair
                .into_inner()
                .map(build_object_entry)
                .collect::<ParseResult<Vec<_>>>()?;
            Ok(Expr::Map { entries })
        }

        rule => Err(ParseError::at(
            &pair,
            format!("unexpected expression rule: {:?}", rule),
        )),
    }
}

fn build_binary_chain(pair: Pair<Rule>) -> ParseResult<Expr> {
    // chain = { operand ~ (op ~ operand)* }, built left-associative
    let mut parts = pair.into_inner();
    let mut expr = build_expression(parts.next().unwrap())?;

    while let Some(op_pair) = parts.next() {
        let op = build_binary_op(&op_pair)?;
        let right = build_expression(parts.next().unwrap())?;
        expr = Expr::Binary {
            op,
            left: Box::new(expr),
            right: Box::new(right),
        };
    }

    Ok(expr)
}

fn build_binary_op(pair: &Pair<Rule>) -> ParseResult<BinaryOp> {
    match pair.as_str() {
        "+" => Ok(BinaryOp::Add),
        "-" => Ok(BinaryOp::Sub),
        "*" => Ok(BinaryOp::Mul),
        "/" => Ok(BinaryOp::Div),
        "%" => Ok(BinaryOp::Mod),
        "<" => Ok(BinaryOp::Lt),
        "<=" => Ok(BinaryOp::Le),
        ">" => Ok(BinaryOp::Gt),
        ">=" => Ok(BinaryOp::Ge),
        "==" => Ok(BinaryOp::Eq),
        "!=" => Ok(BinaryOp::Ne),
        "&&" => Ok(BinaryOp::And),
        "||" => Ok(BinaryOp::Or),
        other => Err(ParseError::at(
            pair,
            format!("unknown binary operator '{}'", other),
        )),
    }
}

fn build_object_entry(pair: Pair<Rule>) -> ParseResult<MapEntry> {
    // object_entry = { (identifier | string) ~ ":" ~ expression }
    let mut parts = pair.into_inner();
    let key_pair = parts.next().unwrap();
    let key = match key_pair.as_rule() {
        Rule::identifier => key_pair.as_str().to_string(),
        Rule::string => unescape(key_pair.into_inner().next().unwrap().as_str()),
        rule => {
            return Err(ParseError::at(
                &key_pair,
                format!("unexpected object key rule: {:?}", rule),
            ))
        }
    };
    let value = build_expression(parts.next().unwrap())?;
    Ok(MapEntry { key, value })
}

/// Resolve backslash escapes inside a string literal body
fn unescape(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    let mut chars = raw.chars();
    while let Some(c) = chars.next() {
        if c != '\\' {
            out.push(c);
            continue;
        }
        match chars.next() {
            Some('n') => out.push('\n'),
            Some('r') => out.push('\r'),
            Some('t') => out.push('\t'),
            Some(other) => out.push(other),
            None => out.push('\\'),
        }
    }
    out
}
