// Copyright (c) 2024-2025 DeepGraph Inc.
// SPDX-License-Identifier: Apache-2.0
//
//! Parser for the filter text form using nom parsers
//!
//! Grammar, loosest binding first:
//!
//! ```text
//! filter     := or_expr
//! or_expr    := and_expr ("OR" and_expr)*
//! and_expr   := not_expr ("AND" not_expr)*
//! not_expr   := "NOT" not_expr | primary
//! primary    := "(" or_expr ")" | "INCLUDE" | "EXCLUDE" | bbox | intersects | predicate
//! predicate  := property ["NOT"] "LIKE" string
//!             | property "IS" ["NOT"] "NULL"
//!             | property ["NOT"] "IN" "(" literal ("," literal)* ")"
//!             | property ["NOT"] "BETWEEN" literal "AND" literal
//!             | operand op operand
//! bbox       := "BBOX" "(" [property ","] num "," num "," num "," num ")"
//! intersects := "INTERSECTS" "(" [property ","] wkt ")"
//! ```

use geo::Geometry;
use geozero::wkt::Wkt;
use geozero::ToGeo;
use log::debug;
use nom::{
    branch::alt,
    bytes::complete::{tag, tag_no_case, take_while, take_while1},
    character::complete::{char, digit0, digit1, multispace0, one_of, satisfy},
    combinator::{all_consuming, map, map_opt, map_res, not, opt, recognize, value, verify},
    error::{Error as NomError, ErrorKind},
    multi::{many0, separated_list1},
    sequence::{delimited, pair, preceded, terminated, tuple},
    IResult,
};

use super::{CompareOp, Expr, Filter, LikePattern};
use crate::geometry::Envelope;
use crate::store::Value;

/// Filter parse error
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum FilterError {
    #[error("Syntax error at offset {offset} near '{near}'")]
    Syntax { offset: usize, near: String },

    #[error("Incomplete filter expression")]
    Incomplete,

    #[error("Empty filter expression")]
    Empty,
}

const RESERVED: &[&str] = &[
    "AND", "OR", "NOT", "LIKE", "IS", "IN", "BETWEEN", "NULL", "TRUE", "FALSE", "INCLUDE",
    "EXCLUDE",
];

pub(crate) fn is_ident_char(c: char) -> bool {
    c.is_alphanumeric() || matches!(c, '_' | '/' | '.' | ':')
}

pub(crate) fn is_reserved(word: &str) -> bool {
    RESERVED.iter().any(|kw| kw.eq_ignore_ascii_case(word))
}

/// Parse the text form of a filter
pub fn parse_filter(input: &str) -> Result<Filter, FilterError> {
    if input.trim().is_empty() {
        return Err(FilterError::Empty);
    }
    match all_consuming(delimited(multispace0, or_expr, multispace0))(input) {
        Ok((_, filter)) => {
            debug!("Parsed filter '{}' as {}", input, filter);
            Ok(filter)
        }
        Err(nom::Err::Error(e)) | Err(nom::Err::Failure(e)) => Err(FilterError::Syntax {
            offset: input.len() - e.input.len(),
            near: e.input.chars().take(24).collect(),
        }),
        Err(nom::Err::Incomplete(_)) => Err(FilterError::Incomplete),
    }
}

fn ws<'a, O, F>(inner: F) -> impl FnMut(&'a str) -> IResult<&'a str, O>
where
    F: FnMut(&'a str) -> IResult<&'a str, O>,
{
    delimited(multispace0, inner, multispace0)
}

fn keyword<'a>(kw: &'static str) -> impl FnMut(&'a str) -> IResult<&'a str, &'a str> {
    ws(terminated(tag_no_case(kw), not(satisfy(is_ident_char))))
}

fn symbol<'a>(c: char) -> impl FnMut(&'a str) -> IResult<&'a str, char> {
    ws(char(c))
}

fn or_expr(input: &str) -> IResult<&str, Filter> {
    map(
        separated_list1(keyword("OR"), and_expr),
        |mut children| {
            if children.len() == 1 {
                children.remove(0)
            } else {
                Filter::Or(children)
            }
        },
    )(input)
}

fn and_expr(input: &str) -> IResult<&str, Filter> {
    map(
        separated_list1(keyword("AND"), not_expr),
        |mut children| {
            if children.len() == 1 {
                children.remove(0)
            } else {
                Filter::And(children)
            }
        },
    )(input)
}

fn not_expr(input: &str) -> IResult<&str, Filter> {
    alt((
        map(preceded(keyword("NOT"), not_expr), |f| Filter::Not(Box::new(f))),
        primary,
    ))(input)
}

fn primary(input: &str) -> IResult<&str, Filter> {
    alt((
        delimited(symbol('('), or_expr, symbol(')')),
        value(Filter::Include, keyword("INCLUDE")),
        value(Filter::Exclude, keyword("EXCLUDE")),
        bbox,
        intersects,
        predicate,
    ))(input)
}

fn bare_identifier(input: &str) -> IResult<&str, &str> {
    verify(
        recognize(pair(
            satisfy(|c| c.is_alphabetic() || c == '_'),
            take_while(is_ident_char),
        )),
        |word: &str| !is_reserved(word),
    )(input)
}

fn quoted_identifier(input: &str) -> IResult<&str, &str> {
    delimited(char('"'), take_while1(|c| c != '"'), char('"'))(input)
}

fn property(input: &str) -> IResult<&str, String> {
    ws(map(alt((quoted_identifier, bare_identifier)), str::to_string))(input)
}

fn string_literal(input: &str) -> IResult<&str, String> {
    ws(delimited(
        char('\''),
        map(
            many0(alt((value('\'', tag("''")), satisfy(|c| c != '\'')))),
            |chars: Vec<char>| chars.into_iter().collect(),
        ),
        char('\''),
    ))(input)
}

fn parse_number(text: &str) -> Result<Value, std::num::ParseFloatError> {
    if !text.contains(|c| matches!(c, '.' | 'e' | 'E')) {
        if let Ok(i) = text.parse::<i64>() {
            return Ok(Value::Integer(i));
        }
    }
    text.parse::<f64>().map(Value::Double)
}

fn number_literal(input: &str) -> IResult<&str, Value> {
    ws(map_res(
        recognize(tuple((
            opt(one_of("+-")),
            digit1,
            opt(pair(char('.'), digit0)),
            opt(tuple((one_of("eE"), opt(one_of("+-")), digit1))),
        ))),
        parse_number,
    ))(input)
}

fn coordinate(input: &str) -> IResult<&str, f64> {
    map_opt(number_literal, |v| v.as_f64())(input)
}

fn literal(input: &str) -> IResult<&str, Value> {
    alt((
        map(string_literal, Value::String),
        number_literal,
        value(Value::Bool(true), keyword("TRUE")),
        value(Value::Bool(false), keyword("FALSE")),
    ))(input)
}

fn operand(input: &str) -> IResult<&str, Expr> {
    alt((map(literal, Expr::Literal), map(property, Expr::Property)))(input)
}

fn compare_op(input: &str) -> IResult<&str, CompareOp> {
    ws(alt((
        value(CompareOp::LtEq, tag("<=")),
        value(CompareOp::NotEq, tag("<>")),
        value(CompareOp::NotEq, tag("!=")),
        value(CompareOp::GtEq, tag(">=")),
        value(CompareOp::Lt, tag("<")),
        value(CompareOp::Gt, tag(">")),
        value(CompareOp::Eq, tag("=")),
    )))(input)
}

fn negate_if(negated: Option<&str>, filter: Filter) -> Filter {
    if negated.is_some() {
        Filter::Not(Box::new(filter))
    } else {
        filter
    }
}

fn predicate(input: &str) -> IResult<&str, Filter> {
    alt((
        like_predicate,
        null_predicate,
        in_predicate,
        between_predicate,
        comparison,
    ))(input)
}

fn like_predicate(input: &str) -> IResult<&str, Filter> {
    map_res(
        tuple((property, opt(keyword("NOT")), keyword("LIKE"), string_literal)),
        |(property, negated, _, pattern)| {
            LikePattern::new(&pattern)
                .map(|pattern| negate_if(negated, Filter::Like { property, pattern }))
        },
    )(input)
}

fn null_predicate(input: &str) -> IResult<&str, Filter> {
    map(
        tuple((property, keyword("IS"), opt(keyword("NOT")), keyword("NULL"))),
        |(property, _, negated, _)| negate_if(negated, Filter::IsNull { property }),
    )(input)
}

fn in_predicate(input: &str) -> IResult<&str, Filter> {
    map(
        tuple((
            property,
            opt(keyword("NOT")),
            keyword("IN"),
            delimited(symbol('('), separated_list1(symbol(','), literal), symbol(')')),
        )),
        |(property, negated, _, values)| negate_if(negated, Filter::In { property, values }),
    )(input)
}

fn between_predicate(input: &str) -> IResult<&str, Filter> {
    map(
        tuple((
            property,
            opt(keyword("NOT")),
            keyword("BETWEEN"),
            literal,
            keyword("AND"),
            literal,
        )),
        |(property, negated, _, lower, _, upper)| {
            negate_if(
                negated,
                Filter::Between {
                    property,
                    lower,
                    upper,
                },
            )
        },
    )(input)
}

fn comparison(input: &str) -> IResult<&str, Filter> {
    map(tuple((operand, compare_op, operand)), |(left, op, right)| {
        Filter::Compare { left, op, right }
    })(input)
}

fn bbox(input: &str) -> IResult<&str, Filter> {
    map(
        preceded(
            keyword("BBOX"),
            delimited(
                symbol('('),
                pair(
                    opt(terminated(property, symbol(','))),
                    tuple((
                        terminated(coordinate, symbol(',')),
                        terminated(coordinate, symbol(',')),
                        terminated(coordinate, symbol(',')),
                        coordinate,
                    )),
                ),
                symbol(')'),
            ),
        ),
        |(property, (x1, y1, x2, y2))| Filter::BBox {
            property,
            envelope: Envelope::new(x1, y1, x2, y2),
        },
    )(input)
}

/// Text up to the closing parenthesis that balances the current group
fn balanced_text(input: &str) -> IResult<&str, &str> {
    let mut depth = 0usize;
    for (idx, c) in input.char_indices() {
        match c {
            '(' => depth += 1,
            ')' if depth == 0 => {
                if input[..idx].trim().is_empty() {
                    break;
                }
                return Ok((&input[idx..], &input[..idx]));
            }
            ')' => depth -= 1,
            _ => {}
        }
    }
    Err(nom::Err::Error(NomError::new(input, ErrorKind::TakeUntil)))
}

fn parse_wkt(text: &str) -> Result<Geometry<f64>, geozero::error::GeozeroError> {
    Wkt(text.trim().to_string()).to_geo()
}

fn intersects(input: &str) -> IResult<&str, Filter> {
    map(
        preceded(
            keyword("INTERSECTS"),
            delimited(
                symbol('('),
                pair(
                    opt(terminated(property, symbol(','))),
                    map_res(balanced_text, parse_wkt),
                ),
                symbol(')'),
            ),
        ),
        |(property, geometry)| Filter::Intersects { property, geometry },
    )(input)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_precedence_and_binds_tighter_than_or() {
        let filter = parse_filter("a = 1 OR b = 2 AND c = 3").unwrap();
        match filter {
            Filter::Or(children) => {
                assert_eq!(children.len(), 2);
                assert!(matches!(children[1], Filter::And(_)));
            }
            other => panic!("unexpected filter {:?}", other),
        }
    }

    #[test]
    fn test_keywords_are_case_insensitive() {
        let filter = parse_filter("not location like 'a%' and elevation between 1 and 5").unwrap();
        assert!(matches!(filter, Filter::And(ref c) if c.len() == 2));
    }

    #[test]
    fn test_between_does_not_swallow_following_and() {
        let filter = parse_filter("x BETWEEN 1 AND 5 AND y = 'z'").unwrap();
        match filter {
            Filter::And(children) => {
                assert!(matches!(children[0], Filter::Between { .. }));
                assert!(matches!(children[1], Filter::Compare { .. }));
            }
            other => panic!("unexpected filter {:?}", other),
        }
    }

    #[test]
    fn test_bbox_with_and_without_property() {
        let with = parse_filter("BBOX(the_geom, 0, 0, 10, 5.5)").unwrap();
        assert_eq!(
            with,
            Filter::BBox {
                property: Some("the_geom".to_string()),
                envelope: Envelope::new(0.0, 0.0, 10.0, 5.5),
            }
        );
        let without = parse_filter("BBOX(-1, -1, 1, 1)").unwrap();
        assert!(matches!(without, Filter::BBox { property: None, .. }));
    }

    #[test]
    fn test_intersects_parses_wkt() {
        let filter =
            parse_filter("INTERSECTS(the_geom, POLYGON((0 0, 4 0, 4 4, 0 4, 0 0)))").unwrap();
        match filter {
            Filter::Intersects { property, geometry } => {
                assert_eq!(property.as_deref(), Some("the_geom"));
                assert!(matches!(geometry, Geometry::Polygon(_)));
            }
            other => panic!("unexpected filter {:?}", other),
        }
    }

    #[test]
    fn test_string_escapes_and_in_list() {
        let filter = parse_filter("name IN ('it''s', 'b', 3)").unwrap();
        match filter {
            Filter::In { property, values } => {
                assert_eq!(property, "name");
                assert_eq!(values[0], Value::from("it's"));
                assert_eq!(values[2], Value::Integer(3));
            }
            other => panic!("unexpected filter {:?}", other),
        }
    }

    #[test]
    fn test_errors() {
        assert_eq!(parse_filter("   "), Err(FilterError::Empty));
        assert!(matches!(
            parse_filter("location = "),
            Err(FilterError::Syntax { .. })
        ));
        assert!(parse_filter("a = 1 AND").is_err());
        assert!(parse_filter("AND = 1").is_err());
    }
}
