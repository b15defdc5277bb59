// Formula parser for data-bound attribute expressions
//
// Format: ~expr, where expr is arithmetic over columns, literals and calls.

use super::ast::{BinOp, Expr, Formula};
use super::lexer::{identifier, number_literal, quoted_identifier, string_literal, ws};
use anyhow::{anyhow, Result};
use nom::{
    branch::alt,
    character::complete::char,
    combinator::{all_consuming, map, opt},
    multi::{many0, separated_list0},
    sequence::{delimited, pair, preceded},
    IResult,
};

/// True when a raw string value should be read as a formula
pub fn is_formula(text: &str) -> bool {
    text.trim_start().starts_with('~')
}

/// Parse `~expr` into a [`Formula`]
pub fn parse_formula(text: &str) -> Result<Formula> {
    let result = all_consuming(preceded(ws(char('~')), expr))(text);
    match result {
        Ok((_, expr)) => Ok(Formula {
            source: text.trim().to_string(),
            expr,
        }),
        Err(e) => Err(anyhow!("Invalid formula '{}': {:?}", text, e)),
    }
}

fn expr(input: &str) -> IResult<&str, Expr> {
    let (input, first) = term(input)?;
    let (input, rest) = many0(pair(
        ws(alt((
            map(char('+'), |_| BinOp::Add),
            map(char('-'), |_| BinOp::Sub),
        ))),
        term,
    ))(input)?;
    Ok((input, fold(first, rest)))
}

fn term(input: &str) -> IResult<&str, Expr> {
    let (input, first) = unary(input)?;
    let (input, rest) = many0(pair(
        ws(alt((
            map(char('*'), |_| BinOp::Mul),
            map(char('/'), |_| BinOp::Div),
        ))),
        unary,
    ))(input)?;
    Ok((input, fold(first, rest)))
}

fn fold(first: Expr, rest: Vec<(BinOp, Expr)>) -> Expr {
    rest.into_iter().fold(first, |lhs, (op, rhs)| {
        Expr::Binary(op, Box::new(lhs), Box::new(rhs))
    })
}

fn unary(input: &str) -> IResult<&str, Expr> {
    alt((
        map(preceded(ws(char('-')), unary), |e| Expr::Neg(Box::new(e))),
        primary,
    ))(input)
}

fn primary(input: &str) -> IResult<&str, Expr> {
    ws(alt((
        delimited(char('('), expr, ws(char(')'))),
        call_or_column,
        map(number_literal, Expr::Number),
        map(string_literal, Expr::Str),
        map(quoted_identifier, Expr::Column),
    )))(input)
}

fn call_or_column(input: &str) -> IResult<&str, Expr> {
    let (input, name) = identifier(input)?;
    let (input, args) = opt(delimited(
        ws(char('(')),
        separated_list0(ws(char(',')), expr),
        ws(char(')')),
    ))(input)?;
    Ok((
        input,
        match args {
            Some(args) => Expr::Call(name, args),
            None => Expr::Column(name),
        },
    ))
}
