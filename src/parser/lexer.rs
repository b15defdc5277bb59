// Shared token parsers

use nom::{
    branch::alt,
    bytes::complete::{is_not, take_while, take_while1},
    character::complete::{char, multispace0, satisfy},
    combinator::{map, recognize},
    number::complete::double,
    sequence::{delimited, pair},
    IResult,
};

/// Wrap a parser so it skips surrounding whitespace
pub fn ws<'a, F, O>(inner: F) -> impl FnMut(&'a str) -> IResult<&'a str, O>
where
    F: FnMut(&'a str) -> IResult<&'a str, O>,
{
    delimited(multispace0, inner, multispace0)
}

/// Identifier: starts with a letter or `_`; continues with alphanumerics, `_` or `.`
pub fn identifier(input: &str) -> IResult<&str, String> {
    map(
        recognize(pair(
            satisfy(|c| c.is_alphabetic() || c == '_'),
            take_while(|c: char| c.is_alphanumeric() || c == '_' || c == '.'),
        )),
        |s: &str| s.to_string(),
    )(input)
}

/// Backtick-quoted column name, for names that aren't identifiers
pub fn quoted_identifier(input: &str) -> IResult<&str, String> {
    map(
        delimited(char('`'), take_while1(|c| c != '`'), char('`')),
        |s: &str| s.to_string(),
    )(input)
}

pub fn number_literal(input: &str) -> IResult<&str, f64> {
    double(input)
}

/// Single- or double-quoted string (no escape sequences)
pub fn string_literal(input: &str) -> IResult<&str, String> {
    alt((
        map(delimited(char('"'), opt_not("\""), char('"')), String::from),
        map(delimited(char('\''), opt_not("'"), char('\'')), String::from),
    ))(input)
}

fn opt_not<'a>(stop: &'static str) -> impl FnMut(&'a str) -> IResult<&'a str, &'a str> {
    move |input: &'a str| match is_not::<_, _, nom::error::Error<&str>>(stop)(input) {
        Ok(res) => Ok(res),
        Err(_) => Ok((input, "")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_identifier() {
        assert_eq!(identifier("price2 + 1"), Ok((" + 1", "price2".to_string())));
        assert_eq!(identifier("as.numeric(x)"), Ok(("(x)", "as.numeric".to_string())));
        assert!(identifier("2x").is_err());
    }

    #[test]
    fn test_string_literal() {
        assert_eq!(string_literal(r#""a b""#), Ok(("", "a b".to_string())));
        assert_eq!(string_literal("''"), Ok(("", String::new())));
    }

    #[test]
    fn test_quoted_identifier() {
        assert_eq!(quoted_identifier("`unit price`"), Ok(("", "unit price".to_string())));
    }
}
