// used for datetime literals
use chrono::NaiveDateTime;
// used for decimal literals
use bigdecimal::BigDecimal;

// used to print out readable forms of a literal
use std::fmt;

/// The typed values a concrete term can carry. Patterns never contain bare
/// values, only [`crate::pattern::Node`]s wrapping these.
///
/// The set mirrors what remote fragment sources actually serve: plain
/// strings, 64-bit integers, arbitrary-precision decimals, booleans and
/// datetimes. Each literal knows its data type tag so heterogeneous result
/// sets stay self-describing.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum Literal {
    String(String),
    Integer(i64),
    Decimal(BigDecimal),
    Boolean(bool),
    DateTime(NaiveDateTime),
}

impl Literal {
    pub fn data_type(&self) -> &'static str {
        match self {
            Literal::String(_) => "String",
            Literal::Integer(_) => "Integer",
            Literal::Decimal(_) => "Decimal",
            Literal::Boolean(_) => "Boolean",
            Literal::DateTime(_) => "DateTime",
        }
    }
}

impl fmt::Display for Literal {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Literal::String(s) => write!(f, "\"{}\"", s),
            Literal::Integer(i) => write!(f, "{}", i),
            Literal::Decimal(d) => write!(f, "{}", d),
            Literal::Boolean(b) => write!(f, "{}", b),
            Literal::DateTime(t) => write!(f, "\"{}\"", t.format("%Y-%m-%dT%H:%M:%S")),
        }
    }
}

impl From<&str> for Literal {
    fn from(s: &str) -> Self { Literal::String(s.to_owned()) }
}
impl From<String> for Literal {
    fn from(s: String) -> Self { Literal::String(s) }
}
impl From<i64> for Literal {
    fn from(i: i64) -> Self { Literal::Integer(i) }
}
impl From<bool> for Literal {
    fn from(b: bool) -> Self { Literal::Boolean(b) }
}
impl From<BigDecimal> for Literal {
    fn from(d: BigDecimal) -> Self { Literal::Decimal(d) }
}
impl From<NaiveDateTime> for Literal {
    fn from(t: NaiveDateTime) -> Self { Literal::DateTime(t) }
}
