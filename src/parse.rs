
use std::str::FromStr;
use std::sync::Arc;

use bigdecimal::BigDecimal;
use chrono::{NaiveDate, NaiveDateTime, NaiveTime};
use lazy_static::lazy_static;
use pest::Parser;
use pest::iterators::Pair;
use pest_derive::Parser;
use regex::Regex;

use crate::datatype::Literal;
use crate::error::{FragstreamError, Result};
use crate::pattern::{Node, Pattern, Term};

#[derive(Parser)]
#[grammar = "pattern.pest"]
struct PatternParser;

lazy_static! {
    // date / datetime shaped string literals get promoted to datetime literals
    static ref DATETIME_SHAPE: Regex = Regex::new(r"^\d{4}-\d{2}-\d{2}T\d{2}:\d{2}:\d{2}$").unwrap();
    static ref DATE_SHAPE: Regex = Regex::new(r"^\d{4}-\d{2}-\d{2}$").unwrap();
}

/// Parse pattern text into a [`Pattern`]. Grammar details live in
/// `pattern.pest`.
pub fn parse_pattern(input: &str) -> Result<Pattern> {
    let mut pairs = PatternParser::parse(Rule::pattern, input).map_err(pest_error)?;
    let pattern = pairs.next().unwrap(); // the grammar yields exactly one pattern
    let mut terms = pattern
        .into_inner()
        .filter(|pair| pair.as_rule() != Rule::EOI)
        .map(parse_term);
    // three terms, guaranteed by the grammar
    let s = terms.next().unwrap()?;
    let p = terms.next().unwrap()?;
    let o = terms.next().unwrap()?;
    Ok(Pattern::new(s, p, o))
}

fn parse_term(pair: Pair<Rule>) -> Result<Term> {
    match pair.as_rule() {
        Rule::variable => Ok(Term::Var(Arc::from(&pair.as_str()[1..]))),
        Rule::iri => {
            let raw = pair.as_str();
            Ok(Term::Node(Node::iri(&raw[1..raw.len() - 1])))
        }
        Rule::string => {
            let content = pair.into_inner().next().unwrap().as_str();
            Ok(Term::Node(Node::Literal(string_literal(&unescape(content)))))
        }
        Rule::number => number_literal(pair.as_str()).map(|l| Term::Node(Node::Literal(l))),
        Rule::boolean => Ok(Term::Node(Node::Literal(Literal::Boolean(pair.as_str() == "true")))),
        other => Err(FragstreamError::Parse {
            message: format!("unexpected rule {:?}", other),
            line: None,
            col: None,
        }),
    }
}

// Strings that look like timestamps become DateTime literals; anything the
// shapes match but chrono rejects (e.g. month 13) stays a plain string.
fn string_literal(content: &str) -> Literal {
    if DATETIME_SHAPE.is_match(content) {
        if let Ok(t) = NaiveDateTime::parse_from_str(content, "%Y-%m-%dT%H:%M:%S") {
            return Literal::DateTime(t);
        }
    }
    if DATE_SHAPE.is_match(content) {
        if let Ok(d) = NaiveDate::parse_from_str(content, "%Y-%m-%d") {
            return Literal::DateTime(d.and_time(NaiveTime::MIN));
        }
    }
    Literal::String(content.to_owned())
}

// Integers that overflow i64 fall back to decimals.
fn number_literal(text: &str) -> Result<Literal> {
    if !text.contains('.') {
        if let Ok(i) = text.parse::<i64>() {
            return Ok(Literal::Integer(i));
        }
    }
    BigDecimal::from_str(text)
        .map(Literal::Decimal)
        .map_err(|e| FragstreamError::Parse {
            message: format!("invalid number {}: {}", text, e),
            line: None,
            col: None,
        })
}

fn unescape(content: &str) -> String {
    let mut out = String::with_capacity(content.len());
    let mut chars = content.chars();
    while let Some(c) = chars.next() {
        if c == '\\' {
            match chars.next() {
                Some('n') => out.push('\n'),
                Some('t') => out.push('\t'),
                Some(other) => out.push(other),
                None => (),
            }
        } else {
            out.push(c);
        }
    }
    out
}

fn pest_error(e: pest::error::Error<Rule>) -> FragstreamError {
    let (line, col) = match e.line_col {
        pest::error::LineColLocation::Pos((l, c)) => (l, c),
        pest::error::LineColLocation::Span((l, c), _) => (l, c),
    };
    FragstreamError::Parse {
        message: e.variant.message().into_owned(),
        line: Some(line),
        col: Some(col),
    }
}
