//! Nom parser for the statement expression language.
//!
//! Grammar, lowest precedence first:
//!
//! ```text
//! expression     := or ( "?" expression ":" expression )?
//! or             := and ( "||" and )*
//! and            := equality ( "&&" equality )*
//! equality       := comparison ( ("==" | "!=") comparison )*
//! comparison     := containment ( ("<=" | ">=" | "<" | ">") containment )*
//! containment    := additive ( "contains" additive )?
//! additive       := multiplicative ( ("+" | "-") multiplicative )*
//! multiplicative := unary ( ("*" | "/" | "%") unary )*
//! unary          := "!" unary | "-" unary | postfix
//! postfix        := primary ( "." ident ( "(" args ")" )? | "[" expression "]" )*
//! primary        := number | string | true | false | null | list | "(" expression ")" | ident
//! ```

use crate::error::{ExpressionError, ExpressionResult};
use nom::{
    IResult,
    branch::alt,
    bytes::complete::{tag, take_while},
    character::complete::{char, digit1, multispace0, satisfy},
    combinator::{all_consuming, map, not, opt, recognize, value},
    error::{Error, ErrorKind},
    multi::{many0, separated_list0},
    sequence::{delimited, pair, preceded, terminated},
};
use serde_json::{Number, Value};

/// Parsed expression tree.
#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    Literal(Value),
    List(Vec<Expr>),
    Variable(String),
    Member(Box<Expr>, String),
    Index(Box<Expr>, Box<Expr>),
    Call(Box<Expr>, String, Vec<Expr>),
    Unary(UnaryOp, Box<Expr>),
    Binary(BinaryOp, Box<Expr>, Box<Expr>),
    Conditional(Box<Expr>, Box<Expr>, Box<Expr>),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnaryOp {
    Not,
    Negate,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinaryOp {
    Or,
    And,
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
    Contains,
    Add,
    Sub,
    Mul,
    Div,
    Rem,
}

/// Parse a complete expression.
pub fn parse_expression(source: &str) -> ExpressionResult<Expr> {
    match all_consuming(ws(expression))(source) {
        Ok((_, expr)) => Ok(expr),
        Err(nom::Err::Error(e)) | Err(nom::Err::Failure(e)) => Err(ExpressionError::Parse {
            expression: source.to_string(),
            details: describe_position(e.input),
        }),
        Err(nom::Err::Incomplete(_)) => Err(ExpressionError::Parse {
            expression: source.to_string(),
            details: "incomplete input".to_string(),
        }),
    }
}

fn describe_position(rest: &str) -> String {
    if rest.is_empty() {
        return "unexpected end of expression".to_string();
    }
    let snippet: String = rest.chars().take(16).collect();
    format!("unexpected input at '{}'", snippet)
}

// =============================================================================
// HELPER PARSERS
// =============================================================================

fn ws<'a, O, F>(inner: F) -> impl FnMut(&'a str) -> IResult<&'a str, O>
where
    F: FnMut(&'a str) -> IResult<&'a str, O>,
{
    delimited(multispace0, inner, multispace0)
}

fn is_ident_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == '_'
}

/// A reserved word not followed by another identifier character.
fn keyword<'a>(word: &'static str) -> impl FnMut(&'a str) -> IResult<&'a str, &'a str> {
    terminated(tag(word), not(satisfy(is_ident_char)))
}

fn identifier(input: &str) -> IResult<&str, String> {
    map(
        recognize(pair(
            satisfy(|c: char| c.is_ascii_alphabetic() || c == '_'),
            take_while(is_ident_char),
        )),
        str::to_string,
    )(input)
}

fn fold_binary(first: Expr, rest: Vec<(BinaryOp, Expr)>) -> Expr {
    rest.into_iter().fold(first, |lhs, (op, rhs)| {
        Expr::Binary(op, Box::new(lhs), Box::new(rhs))
    })
}

// =============================================================================
// OPERATORS
// =============================================================================

fn expression(input: &str) -> IResult<&str, Expr> {
    let (input, condition) = or_expr(input)?;
    let (input, branches) = opt(pair(
        preceded(ws(char('?')), expression),
        preceded(ws(char(':')), expression),
    ))(input)?;
    let expr = match branches {
        Some((then, otherwise)) => {
            Expr::Conditional(Box::new(condition), Box::new(then), Box::new(otherwise))
        }
        None => condition,
    };
    Ok((input, expr))
}

fn or_expr(input: &str) -> IResult<&str, Expr> {
    let (input, first) = and_expr(input)?;
    let (input, rest) = many0(pair(value(BinaryOp::Or, ws(tag("||"))), and_expr))(input)?;
    Ok((input, fold_binary(first, rest)))
}

fn and_expr(input: &str) -> IResult<&str, Expr> {
    let (input, first) = equality(input)?;
    let (input, rest) = many0(pair(value(BinaryOp::And, ws(tag("&&"))), equality))(input)?;
    Ok((input, fold_binary(first, rest)))
}

fn equality(input: &str) -> IResult<&str, Expr> {
    let (input, first) = comparison(input)?;
    let (input, rest) = many0(pair(
        ws(alt((
            value(BinaryOp::Eq, tag("==")),
            value(BinaryOp::Ne, tag("!=")),
        ))),
        comparison,
    ))(input)?;
    Ok((input, fold_binary(first, rest)))
}

fn comparison(input: &str) -> IResult<&str, Expr> {
    let (input, first) = containment(input)?;
    let (input, rest) = many0(pair(
        ws(alt((
            value(BinaryOp::Le, tag("<=")),
            value(BinaryOp::Ge, tag(">=")),
            value(BinaryOp::Lt, tag("<")),
            value(BinaryOp::Gt, tag(">")),
        ))),
        containment,
    ))(input)?;
    Ok((input, fold_binary(first, rest)))
}

fn containment(input: &str) -> IResult<&str, Expr> {
    let (input, container) = additive(input)?;
    let (input, item) = opt(preceded(ws(keyword("contains")), additive))(input)?;
    let expr = match item {
        Some(item) => Expr::Binary(BinaryOp::Contains, Box::new(container), Box::new(item)),
        None => container,
    };
    Ok((input, expr))
}

fn additive(input: &str) -> IResult<&str, Expr> {
    let (input, first) = multiplicative(input)?;
    let (input, rest) = many0(pair(
        ws(alt((
            value(BinaryOp::Add, char('+')),
            value(BinaryOp::Sub, char('-')),
        ))),
        multiplicative,
    ))(input)?;
    Ok((input, fold_binary(first, rest)))
}

fn multiplicative(input: &str) -> IResult<&str, Expr> {
    let (input, first) = unary(input)?;
    let (input, rest) = many0(pair(
        ws(alt((
            value(BinaryOp::Mul, char('*')),
            value(BinaryOp::Div, char('/')),
            value(BinaryOp::Rem, char('%')),
        ))),
        unary,
    ))(input)?;
    Ok((input, fold_binary(first, rest)))
}

fn unary(input: &str) -> IResult<&str, Expr> {
    alt((
        map(preceded(ws(char('!')), unary), |e| {
            Expr::Unary(UnaryOp::Not, Box::new(e))
        }),
        map(preceded(ws(char('-')), unary), |e| {
            Expr::Unary(UnaryOp::Negate, Box::new(e))
        }),
        postfix,
    ))(input)
}

// =============================================================================
// POSTFIX AND PRIMARY
// =============================================================================

enum Suffix {
    Member(String),
    Call(String, Vec<Expr>),
    Index(Expr),
}

fn arguments(input: &str) -> IResult<&str, Vec<Expr>> {
    delimited(
        ws(char('(')),
        separated_list0(ws(char(',')), expression),
        ws(char(')')),
    )(input)
}

fn member_suffix(input: &str) -> IResult<&str, Suffix> {
    let (input, name) = preceded(ws(char('.')), identifier)(input)?;
    let (input, args) = opt(arguments)(input)?;
    let suffix = match args {
        Some(args) => Suffix::Call(name, args),
        None => Suffix::Member(name),
    };
    Ok((input, suffix))
}

fn index_suffix(input: &str) -> IResult<&str, Suffix> {
    map(
        delimited(ws(char('[')), expression, ws(char(']'))),
        Suffix::Index,
    )(input)
}

fn postfix(input: &str) -> IResult<&str, Expr> {
    let (input, base) = primary(input)?;
    let (input, suffixes) = many0(alt((member_suffix, index_suffix)))(input)?;
    let expr = suffixes.into_iter().fold(base, |target, suffix| match suffix {
        Suffix::Member(name) => Expr::Member(Box::new(target), name),
        Suffix::Call(name, args) => Expr::Call(Box::new(target), name, args),
        Suffix::Index(index) => Expr::Index(Box::new(target), Box::new(index)),
    });
    Ok((input, expr))
}

fn primary(input: &str) -> IResult<&str, Expr> {
    ws(alt((
        number_literal,
        map(string_literal, |s| Expr::Literal(Value::String(s))),
        value(Expr::Literal(Value::Bool(true)), keyword("true")),
        value(Expr::Literal(Value::Bool(false)), keyword("false")),
        value(Expr::Literal(Value::Null), keyword("null")),
        map(
            delimited(
                char('['),
                separated_list0(ws(char(',')), expression),
                ws(char(']')),
            ),
            Expr::List,
        ),
        delimited(char('('), expression, ws(char(')'))),
        map(identifier, Expr::Variable),
    )))(input)
}

fn number_literal(input: &str) -> IResult<&str, Expr> {
    let (rest, text) = recognize(pair(digit1, opt(pair(char('.'), digit1))))(input)?;
    let number = if text.contains('.') {
        text.parse::<f64>().ok().and_then(Number::from_f64)
    } else {
        text.parse::<i64>().ok().map(Number::from)
    };
    match number {
        Some(n) => Ok((rest, Expr::Literal(Value::Number(n)))),
        None => Err(nom::Err::Failure(Error::new(input, ErrorKind::Digit))),
    }
}

/// Single or double quoted string with backslash escapes.
fn string_literal(input: &str) -> IResult<&str, String> {
    let mut chars = input.char_indices();
    let quote = match chars.next() {
        Some((_, q @ ('\'' | '"'))) => q,
        _ => return Err(nom::Err::Error(Error::new(input, ErrorKind::Char))),
    };
    let mut out = String::new();
    let mut escaped = false;
    for (idx, c) in chars {
        if escaped {
            out.push(match c {
                'n' => '\n',
                't' => '\t',
                'r' => '\r',
                other => other,
            });
            escaped = false;
        } else if c == '\\' {
            escaped = true;
        } else if c == quote {
            return Ok((&input[idx + c.len_utf8()..], out));
        } else {
            out.push(c);
        }
    }
    Err(nom::Err::Failure(Error::new(input, ErrorKind::Char)))
}
