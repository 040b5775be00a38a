// Copyright (c) 2024-2025 DeepGraph Inc.
// SPDX-License-Identifier: Apache-2.0
//
//! Filter predicates over granule records
//!
//! Filters combine attribute comparisons and spatial predicates. They are
//! parsed from a CQL-like text form (see [`parser`]) and evaluated directly
//! against records.

pub mod parser;

use geo::{Geometry, Intersects};
use regex::Regex;
use std::fmt;

use crate::geometry::Envelope;
use crate::store::{Record, Value};

pub use parser::{parse_filter, FilterError};

/// Prefix of property names bound from the granule being processed
pub const GRANULE_PREFIX: &str = "granule/";

/// Operand of a comparison
#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    Property(String),
    Literal(Value),
}

impl Expr {
    fn resolve<'a>(&'a self, record: &'a Record) -> Option<&'a Value> {
        match self {
            Expr::Property(name) => record.get(name),
            Expr::Literal(value) => Some(value),
        }
    }
}

impl fmt::Display for Expr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Expr::Property(name) => write_property(f, name),
            Expr::Literal(value) => write!(f, "{}", value),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompareOp {
    Eq,
    NotEq,
    Lt,
    LtEq,
    Gt,
    GtEq,
}

impl fmt::Display for CompareOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let op = match self {
            CompareOp::Eq => "=",
            CompareOp::NotEq => "<>",
            CompareOp::Lt => "<",
            CompareOp::LtEq => "<=",
            CompareOp::Gt => ">",
            CompareOp::GtEq => ">=",
        };
        f.write_str(op)
    }
}

/// Compiled LIKE pattern
///
/// `%` and `*` match any run of characters, `_` and `?` match one character.
#[derive(Debug, Clone)]
pub struct LikePattern {
    pattern: String,
    regex: Regex,
}

impl LikePattern {
    pub fn new(pattern: &str) -> Result<Self, regex::Error> {
        let mut expr = String::with_capacity(pattern.len() + 8);
        expr.push_str("(?s)^");
        for c in pattern.chars() {
            match c {
                '%' | '*' => expr.push_str(".*"),
                '_' | '?' => expr.push('.'),
                other => expr.push_str(&regex::escape(other.encode_utf8(&mut [0u8; 4]))),
            }
        }
        expr.push('$');
        Ok(Self {
            pattern: pattern.to_string(),
            regex: Regex::new(&expr)?,
        })
    }

    pub fn as_str(&self) -> &str {
        &self.pattern
    }

    pub fn matches(&self, text: &str) -> bool {
        self.regex.is_match(text)
    }
}

impl PartialEq for LikePattern {
    fn eq(&self, other: &Self) -> bool {
        self.pattern == other.pattern
    }
}

/// Boolean predicate over a record
#[derive(Debug, Clone, PartialEq)]
pub enum Filter {
    Include,
    Exclude,
    And(Vec<Filter>),
    Or(Vec<Filter>),
    Not(Box<Filter>),
    Compare {
        left: Expr,
        op: CompareOp,
        right: Expr,
    },
    Like {
        property: String,
        pattern: LikePattern,
    },
    IsNull {
        property: String,
    },
    In {
        property: String,
        values: Vec<Value>,
    },
    Between {
        property: String,
        lower: Value,
        upper: Value,
    },
    /// Envelope intersection
    ///
    /// `None` targets the schema's default geometry. It is resolved with
    /// [`Filter::with_default_geometry`] before evaluation; left unresolved,
    /// the predicate matches nothing.
    BBox {
        property: Option<String>,
        envelope: Envelope,
    },
    Intersects {
        property: Option<String>,
        geometry: Geometry<f64>,
    },
}

impl Filter {
    /// Parse the text form of a filter
    pub fn parse(text: &str) -> Result<Filter, FilterError> {
        parse_filter(text)
    }

    pub fn bbox(envelope: Envelope) -> Filter {
        Filter::BBox {
            property: None,
            envelope,
        }
    }

    pub fn equals(property: impl Into<String>, value: impl Into<Value>) -> Filter {
        Filter::Compare {
            left: Expr::Property(property.into()),
            op: CompareOp::Eq,
            right: Expr::Literal(value.into()),
        }
    }

    /// Conjunction that folds away `Include` operands
    pub fn and(self, other: Filter) -> Filter {
        match (self, other) {
            (Filter::Include, f) | (f, Filter::Include) => f,
            (Filter::Exclude, _) | (_, Filter::Exclude) => Filter::Exclude,
            (Filter::And(mut a), Filter::And(b)) => {
                a.extend(b);
                Filter::And(a)
            }
            (Filter::And(mut a), f) => {
                a.push(f);
                Filter::And(a)
            }
            (f, Filter::And(mut b)) => {
                b.insert(0, f);
                Filter::And(b)
            }
            (a, b) => Filter::And(vec![a, b]),
        }
    }

    /// Point spatial predicates without a property at `geometry_attribute`
    pub fn with_default_geometry(&self, geometry_attribute: &str) -> Filter {
        let resolve = |property: &Option<String>| {
            Some(property.clone().unwrap_or_else(|| geometry_attribute.to_string()))
        };
        match self {
            Filter::And(children) => Filter::And(
                children
                    .iter()
                    .map(|f| f.with_default_geometry(geometry_attribute))
                    .collect(),
            ),
            Filter::Or(children) => Filter::Or(
                children
                    .iter()
                    .map(|f| f.with_default_geometry(geometry_attribute))
                    .collect(),
            ),
            Filter::Not(inner) => Filter::Not(Box::new(inner.with_default_geometry(geometry_attribute))),
            Filter::BBox { property, envelope } => Filter::BBox {
                property: resolve(property),
                envelope: *envelope,
            },
            Filter::Intersects { property, geometry } => Filter::Intersects {
                property: resolve(property),
                geometry: geometry.clone(),
            },
            other => other.clone(),
        }
    }

    /// Evaluate against a record
    ///
    /// Missing attributes and nulls make comparisons false.
    pub fn evaluate(&self, record: &Record) -> bool {
        match self {
            Filter::Include => true,
            Filter::Exclude => false,
            Filter::And(children) => children.iter().all(|f| f.evaluate(record)),
            Filter::Or(children) => children.iter().any(|f| f.evaluate(record)),
            Filter::Not(inner) => !inner.evaluate(record),
            Filter::Compare { left, op, right } => {
                let (Some(l), Some(r)) = (left.resolve(record), right.resolve(record)) else {
                    return false;
                };
                if l.is_null() || r.is_null() {
                    return false;
                }
                match op {
                    CompareOp::Eq => l.loosely_equals(r),
                    CompareOp::NotEq => match (l, r) {
                        (Value::Geometry(a), Value::Geometry(b)) => a != b,
                        _ => l.compare(r).is_some_and(|o| o.is_ne()),
                    },
                    CompareOp::Lt => l.compare(r).is_some_and(|o| o.is_lt()),
                    CompareOp::LtEq => l.compare(r).is_some_and(|o| o.is_le()),
                    CompareOp::Gt => l.compare(r).is_some_and(|o| o.is_gt()),
                    CompareOp::GtEq => l.compare(r).is_some_and(|o| o.is_ge()),
                }
            }
            Filter::Like { property, pattern } => match record.get(property) {
                Some(Value::String(s)) => pattern.matches(s),
                Some(Value::Null) | None => false,
                Some(other) => pattern.matches(&other.to_string()),
            },
            Filter::IsNull { property } => record.get(property).map_or(true, Value::is_null),
            Filter::In { property, values } => record
                .get(property)
                .filter(|v| !v.is_null())
                .is_some_and(|v| values.iter().any(|candidate| v.loosely_equals(candidate))),
            Filter::Between {
                property,
                lower,
                upper,
            } => record.get(property).is_some_and(|v| {
                v.compare(lower).is_some_and(|o| o.is_ge())
                    && v.compare(upper).is_some_and(|o| o.is_le())
            }),
            Filter::BBox { property, envelope } => match target_geometry(record, property) {
                Some(g) => !envelope.is_empty() && g.intersects(&Geometry::Rect(envelope.to_rect())),
                None => false,
            },
            Filter::Intersects { property, geometry } => {
                target_geometry(record, property).is_some_and(|g| g.intersects(geometry))
            }
        }
    }

    /// Envelope every matching record's default geometry must intersect
    ///
    /// Returns `None` when the filter places no usable spatial bound. Only
    /// predicates on `geometry_attribute` (or the default geometry) count.
    pub fn spatial_envelope(&self, geometry_attribute: &str) -> Option<Envelope> {
        let targets_default = |property: &Option<String>| {
            property
                .as_deref()
                .map_or(true, |name| name == geometry_attribute)
        };
        match self {
            Filter::Exclude => Some(Envelope::empty()),
            Filter::BBox { property, envelope } if targets_default(property) => Some(*envelope),
            Filter::Intersects { property, geometry } if targets_default(property) => {
                Some(Envelope::of_geometry(geometry).unwrap_or_else(Envelope::empty))
            }
            Filter::And(children) => children
                .iter()
                .filter_map(|f| f.spatial_envelope(geometry_attribute))
                .reduce(|a, b| a.intersection(&b)),
            Filter::Or(children) => {
                let mut acc = Envelope::empty();
                for child in children {
                    acc.expand_to_include(&child.spatial_envelope(geometry_attribute)?);
                }
                Some(acc)
            }
            _ => None,
        }
    }

    /// Replace `granule/<attr>` operands with the granule's attribute values
    ///
    /// Missing granule attributes bind to null, which makes the comparison false.
    pub fn bind(&self, granule: &Record) -> Filter {
        let bind_expr = |expr: &Expr| match expr {
            Expr::Property(name) => match name.strip_prefix(GRANULE_PREFIX) {
                Some(attr) => Expr::Literal(granule.get(attr).cloned().unwrap_or(Value::Null)),
                None => expr.clone(),
            },
            Expr::Literal(_) => expr.clone(),
        };
        match self {
            Filter::And(children) => Filter::And(children.iter().map(|f| f.bind(granule)).collect()),
            Filter::Or(children) => Filter::Or(children.iter().map(|f| f.bind(granule)).collect()),
            Filter::Not(inner) => Filter::Not(Box::new(inner.bind(granule))),
            Filter::Compare { left, op, right } => Filter::Compare {
                left: bind_expr(left),
                op: *op,
                right: bind_expr(right),
            },
            other => other.clone(),
        }
    }

    /// Names of all properties the filter reads
    pub fn properties(&self) -> Vec<String> {
        let mut out = Vec::new();
        self.collect_properties(&mut out);
        out.sort();
        out.dedup();
        out
    }

    fn collect_properties(&self, out: &mut Vec<String>) {
        match self {
            Filter::And(children) | Filter::Or(children) => {
                children.iter().for_each(|f| f.collect_properties(out))
            }
            Filter::Not(inner) => inner.collect_properties(out),
            Filter::Compare { left, right, .. } => {
                for expr in [left, right] {
                    if let Expr::Property(name) = expr {
                        out.push(name.clone());
                    }
                }
            }
            Filter::Like { property, .. }
            | Filter::IsNull { property }
            | Filter::In { property, .. }
            | Filter::Between { property, .. } => out.push(property.clone()),
            Filter::BBox { property, .. } | Filter::Intersects { property, .. } => {
                out.extend(property.clone())
            }
            Filter::Include | Filter::Exclude => {}
        }
    }
}

impl Default for Filter {
    fn default() -> Self {
        Filter::Include
    }
}

fn target_geometry<'a>(record: &'a Record, property: &Option<String>) -> Option<&'a Geometry<f64>> {
    property.as_deref().and_then(|name| record.geometry(name))
}

fn write_property(f: &mut fmt::Formatter<'_>, name: &str) -> fmt::Result {
    let bare = name
        .chars()
        .next()
        .is_some_and(|c| c.is_alphabetic() || c == '_')
        && name.chars().all(parser::is_ident_char)
        && !parser::is_reserved(name);
    if bare {
        f.write_str(name)
    } else {
        write!(f, "\"{}\"", name)
    }
}

fn write_joined(f: &mut fmt::Formatter<'_>, children: &[Filter], sep: &str) -> fmt::Result {
    f.write_str("(")?;
    for (i, child) in children.iter().enumerate() {
        if i > 0 {
            write!(f, " {} ", sep)?;
        }
        write!(f, "{}", child)?;
    }
    f.write_str(")")
}

impl fmt::Display for Filter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Filter::Include => f.write_str("INCLUDE"),
            Filter::Exclude => f.write_str("EXCLUDE"),
            Filter::And(children) => write_joined(f, children, "AND"),
            Filter::Or(children) => write_joined(f, children, "OR"),
            Filter::Not(inner) => write!(f, "NOT ({})", inner),
            Filter::Compare { left, op, right } => write!(f, "{} {} {}", left, op, right),
            Filter::Like { property, pattern } => {
                write_property(f, property)?;
                write!(f, " LIKE {}", Value::from(pattern.as_str()))
            }
            Filter::IsNull { property } => {
                write_property(f, property)?;
                f.write_str(" IS NULL")
            }
            Filter::In { property, values } => {
                write_property(f, property)?;
                f.write_str(" IN (")?;
                for (i, v) in values.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{}", v)?;
                }
                f.write_str(")")
            }
            Filter::Between {
                property,
                lower,
                upper,
            } => {
                write_property(f, property)?;
                write!(f, " BETWEEN {} AND {}", lower, upper)
            }
            Filter::BBox { property, envelope } => {
                f.write_str("BBOX(")?;
                if let Some(p) = property {
                    write_property(f, p)?;
                    f.write_str(", ")?;
                }
                write!(f, "{})", envelope)
            }
            Filter::Intersects { property, geometry } => {
                f.write_str("INTERSECTS(")?;
                if let Some(p) = property {
                    write_property(f, p)?;
                    f.write_str(", ")?;
                }
                write!(f, "{})", crate::geometry::to_wkt(geometry))
            }
        }
    }
}
