//! Record queries and their textual grammar.
//!
//! A query is a select list, at most one filter predicate, an optional
//! ordering and an optional row cap. Hosts backed by a string-based web API
//! receive them rendered as query options:
//!
//! ```text
//! ?$select=new_tagid,new_name&$orderby=new_name asc&$filter=contains(new_name,'bl')
//! ```
//!
//! Two predicate forms exist:
//! - equality: `attr eq value` (GUIDs, numbers and booleans unquoted, text quoted)
//! - substring containment: `contains(attr,'text')`
//!
//! Inside quotes a single quote is written twice (`'it''s'`).

use nom::{
    branch::alt,
    bytes::complete::{tag, take_while, take_while1},
    character::complete::{char as pchar, multispace0, multispace1},
    combinator::{all_consuming, map, opt, recognize},
    error::{Error as NomError, ErrorKind},
    sequence::{delimited, preceded, tuple},
    IResult,
};
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;
use uuid::Uuid;

// ============================================================================
// Query Model
// ============================================================================

/// Right-hand side of an equality predicate.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Literal {
    /// Rendered verbatim (GUIDs, numbers, booleans)
    Raw(String),
    /// Rendered single-quoted
    Text(String),
}

impl Literal {
    /// Pick the rendering for `value`: GUIDs, numbers and booleans go raw.
    pub fn infer(value: &str) -> Self {
        let raw = Uuid::parse_str(value).is_ok()
            || value.parse::<i64>().is_ok()
            || value.parse::<f64>().map(f64::is_finite).unwrap_or(false)
            || matches!(value, "true" | "false" | "null");
        if raw {
            Literal::Raw(value.to_string())
        } else {
            Literal::Text(value.to_string())
        }
    }

    pub fn value(&self) -> &str {
        match self {
            Literal::Raw(v) | Literal::Text(v) => v,
        }
    }
}

impl fmt::Display for Literal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Literal::Raw(v) => write!(f, "{v}"),
            Literal::Text(v) => write!(f, "'{}'", escape_quotes(v)),
        }
    }
}

/// A single filter predicate. No boolean combinators.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum FilterExpr {
    Eq { attribute: String, value: Literal },
    Contains { attribute: String, text: String },
}

impl FilterExpr {
    pub fn eq(attribute: impl Into<String>, value: &str) -> Self {
        FilterExpr::Eq {
            attribute: attribute.into(),
            value: Literal::infer(value),
        }
    }

    pub fn contains(attribute: impl Into<String>, text: impl Into<String>) -> Self {
        FilterExpr::Contains {
            attribute: attribute.into(),
            text: text.into(),
        }
    }
}

impl fmt::Display for FilterExpr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FilterExpr::Eq { attribute, value } => write!(f, "{attribute} eq {value}"),
            FilterExpr::Contains { attribute, text } => {
                write!(f, "contains({attribute},'{}')", escape_quotes(text))
            }
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum SortDirection {
    #[default]
    Asc,
    Desc,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderBy {
    pub attribute: String,
    pub direction: SortDirection,
}

impl OrderBy {
    pub fn asc(attribute: impl Into<String>) -> Self {
        Self {
            attribute: attribute.into(),
            direction: SortDirection::Asc,
        }
    }

    pub fn desc(attribute: impl Into<String>) -> Self {
        Self {
            attribute: attribute.into(),
            direction: SortDirection::Desc,
        }
    }
}

impl fmt::Display for OrderBy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let dir = match self.direction {
            SortDirection::Asc => "asc",
            SortDirection::Desc => "desc",
        };
        write!(f, "{} {dir}", self.attribute)
    }
}

/// A `fetch_many` request.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct RecordQuery {
    pub select: Vec<String>,
    pub filter: Option<FilterExpr>,
    pub order_by: Option<OrderBy>,
    pub top: Option<usize>,
}

impl RecordQuery {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn select<I, S>(mut self, fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.select = fields.into_iter().map(Into::into).collect();
        self
    }

    pub fn filter(mut self, filter: FilterExpr) -> Self {
        self.filter = Some(filter);
        self
    }

    pub fn order_by(mut self, order_by: OrderBy) -> Self {
        self.order_by = Some(order_by);
        self
    }

    pub fn top(mut self, top: usize) -> Self {
        self.top = Some(top);
        self
    }

    /// Render as `?$select=..&$orderby=..&$filter=..&$top=..` (empty when
    /// the query has no clauses).
    pub fn to_query_options(&self) -> String {
        let mut parts = Vec::new();
        if !self.select.is_empty() {
            parts.push(format!("$select={}", self.select.join(",")));
        }
        if let Some(order_by) = &self.order_by {
            parts.push(format!("$orderby={order_by}"));
        }
        if let Some(filter) = &self.filter {
            parts.push(format!("$filter={filter}"));
        }
        if let Some(top) = self.top {
            parts.push(format!("$top={top}"));
        }
        if parts.is_empty() {
            String::new()
        } else {
            format!("?{}", parts.join("&"))
        }
    }
}

fn escape_quotes(text: &str) -> String {
    text.replace('\'', "''")
}

// ============================================================================
// Parser
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum QueryParseError {
    #[error("invalid filter `{0}`: expected `attr eq value` or `contains(attr,'text')`")]
    Filter(String),
    #[error("invalid ordering `{0}`: expected `attr [asc|desc]`")]
    OrderBy(String),
}

/// Parse a single filter predicate.
pub fn parse_filter(text: &str) -> Result<FilterExpr, QueryParseError> {
    all_consuming(delimited(
        multispace0,
        alt((parse_contains, parse_eq)),
        multispace0,
    ))(text)
    .map(|(_, filter)| filter)
    .map_err(|_| QueryParseError::Filter(text.to_string()))
}

/// Parse an ordering clause; the direction defaults to ascending.
pub fn parse_order_by(text: &str) -> Result<OrderBy, QueryParseError> {
    fn parser(input: &str) -> IResult<&str, OrderBy> {
        let (input, attribute) = parse_ident(input)?;
        let (input, direction) = opt(preceded(
            multispace1,
            alt((
                map(tag("asc"), |_| SortDirection::Asc),
                map(tag("desc"), |_| SortDirection::Desc),
            )),
        ))(input)?;
        Ok((
            input,
            OrderBy {
                attribute: attribute.to_string(),
                direction: direction.unwrap_or_default(),
            },
        ))
    }

    all_consuming(delimited(multispace0, parser, multispace0))(text)
        .map(|(_, order_by)| order_by)
        .map_err(|_| QueryParseError::OrderBy(text.to_string()))
}

fn is_ident_start(c: char) -> bool {
    c.is_ascii_alphabetic() || c == '_'
}

fn is_ident_continue(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == '_'
}

fn parse_ident(input: &str) -> IResult<&str, &str> {
    recognize(tuple((
        take_while1(is_ident_start),
        take_while(is_ident_continue),
    )))(input)
}

/// A single-quoted string with `''` as the escaped quote.
fn parse_quoted(input: &str) -> IResult<&str, String> {
    let (mut rest, _) = pchar('\'')(input)?;
    let mut out = String::new();
    loop {
        let Some(idx) = rest.find('\'') else {
            return Err(nom::Err::Error(NomError::new(rest, ErrorKind::Char)));
        };
        out.push_str(&rest[..idx]);
        let after = &rest[idx + 1..];
        match after.strip_prefix('\'') {
            Some(escaped) => {
                out.push('\'');
                rest = escaped;
            }
            None => return Ok((after, out)),
        }
    }
}

fn parse_raw_literal(input: &str) -> IResult<&str, &str> {
    take_while1(|c: char| !c.is_whitespace() && c != '\'' && c != '(' && c != ')')(input)
}

fn parse_contains(input: &str) -> IResult<&str, FilterExpr> {
    let (input, _) = tag("contains")(input)?;
    let (input, _) = multispace0(input)?;
    let (input, _) = pchar('(')(input)?;
    let (input, _) = multispace0(input)?;
    let (input, attribute) = parse_ident(input)?;
    let (input, _) = multispace0(input)?;
    let (input, _) = pchar(',')(input)?;
    let (input, _) = multispace0(input)?;
    let (input, text) = parse_quoted(input)?;
    let (input, _) = multispace0(input)?;
    let (input, _) = pchar(')')(input)?;
    Ok((
        input,
        FilterExpr::Contains {
            attribute: attribute.to_string(),
            text,
        },
    ))
}

fn parse_eq(input: &str) -> IResult<&str, FilterExpr> {
    let (input, attribute) = parse_ident(input)?;
    let (input, _) = multispace1(input)?;
    let (input, _) = tag("eq")(input)?;
    let (input, _) = multispace1(input)?;
    let (input, value) = alt((
        map(parse_quoted, Literal::Text),
        map(parse_raw_literal, |raw: &str| Literal::Raw(raw.to_string())),
    ))(input)?;
    Ok((
        input,
        FilterExpr::Eq {
            attribute: attribute.to_string(),
            value,
        },
    ))
}
