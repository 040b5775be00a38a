// Copyright (c) 2024-2025 DeepGraph Inc.
// SPDX-License-Identifier: Apache-2.0
//
//! Record store types and error handling
//!
//! This module defines the attribute values, records and schemas exchanged
//! with a record store, plus the store error type.

use chrono::{DateTime, Utc};
use geo::Geometry;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::collections::BTreeMap;
use std::fmt;

use crate::geometry;

/// Attribute value of a granule record
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Value {
    Null,
    Bool(bool),
    Integer(i64),
    Double(f64),
    String(String),
    Timestamp(DateTime<Utc>),
    Geometry(Geometry<f64>),
}

impl Value {
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Integer(i) => Some(*i as f64),
            Value::Double(d) => Some(*d),
            _ => None,
        }
    }

    pub fn as_geometry(&self) -> Option<&Geometry<f64>> {
        match self {
            Value::Geometry(g) => Some(g),
            _ => None,
        }
    }

    /// Timestamp view, parsing RFC 3339 strings
    pub fn as_timestamp(&self) -> Option<DateTime<Utc>> {
        match self {
            Value::Timestamp(ts) => Some(*ts),
            Value::String(s) => DateTime::parse_from_rfc3339(s)
                .ok()
                .map(|ts| ts.with_timezone(&Utc)),
            _ => None,
        }
    }

    /// Attribute kind this value belongs to
    pub fn kind(&self) -> Option<AttributeKind> {
        match self {
            Value::Null => None,
            Value::Bool(_) => Some(AttributeKind::Boolean),
            Value::Integer(_) => Some(AttributeKind::Integer),
            Value::Double(_) => Some(AttributeKind::Double),
            Value::String(_) => Some(AttributeKind::String),
            Value::Timestamp(_) => Some(AttributeKind::Timestamp),
            Value::Geometry(_) => Some(AttributeKind::Geometry),
        }
    }

    /// Compare two values the way filters do
    ///
    /// Integers and doubles compare numerically; timestamps compare with
    /// RFC 3339 strings. Null and geometries are not ordered.
    pub fn compare(&self, other: &Value) -> Option<Ordering> {
        match (self, other) {
            (Value::Null, _) | (_, Value::Null) => None,
            (Value::Bool(a), Value::Bool(b)) => Some(a.cmp(b)),
            (Value::String(a), Value::String(b)) => Some(a.cmp(b)),
            (Value::Timestamp(_), _) | (_, Value::Timestamp(_)) => {
                match (self.as_timestamp(), other.as_timestamp()) {
                    (Some(a), Some(b)) => Some(a.cmp(&b)),
                    _ => None,
                }
            }
            (Value::Geometry(_), _) | (_, Value::Geometry(_)) => None,
            _ => match (self.as_f64(), other.as_f64()) {
                (Some(a), Some(b)) => a.partial_cmp(&b),
                _ => None,
            },
        }
    }

    /// Loose equality used by filters and aggregates
    pub fn loosely_equals(&self, other: &Value) -> bool {
        match (self, other) {
            (Value::Geometry(a), Value::Geometry(b)) => a == b,
            _ => self.compare(other) == Some(Ordering::Equal),
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => write!(f, "NULL"),
            Value::Bool(b) => write!(f, "{}", if *b { "TRUE" } else { "FALSE" }),
            Value::Integer(i) => write!(f, "{}", i),
            Value::Double(d) => write!(f, "{:?}", d),
            Value::String(s) => write!(f, "'{}'", s.replace('\'', "''")),
            Value::Timestamp(ts) => write!(f, "'{}'", ts.to_rfc3339()),
            Value::Geometry(g) => f.write_str(&geometry::to_wkt(g)),
        }
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::String(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::String(s)
    }
}

impl From<i64> for Value {
    fn from(i: i64) -> Self {
        Value::Integer(i)
    }
}

impl From<f64> for Value {
    fn from(d: f64) -> Self {
        Value::Double(d)
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

impl From<DateTime<Utc>> for Value {
    fn from(ts: DateTime<Utc>) -> Self {
        Value::Timestamp(ts)
    }
}

impl From<Geometry<f64>> for Value {
    fn from(g: Geometry<f64>) -> Self {
        Value::Geometry(g)
    }
}

/// Kind of a schema attribute
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AttributeKind {
    Boolean,
    Integer,
    Double,
    String,
    Timestamp,
    Geometry,
}

impl AttributeKind {
    /// Whether values of this kind can be sorted and aggregated with min/max
    pub fn is_comparable(&self) -> bool {
        !matches!(self, AttributeKind::Geometry)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AttributeDescriptor {
    pub name: String,
    pub kind: AttributeKind,
}

/// Schema of one record type
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Schema {
    pub type_name: String,
    pub attributes: Vec<AttributeDescriptor>,
    /// Name of the default geometry attribute
    pub geometry_attribute: Option<String>,
}

impl Schema {
    pub fn new(type_name: impl Into<String>) -> Self {
        Self {
            type_name: type_name.into(),
            attributes: Vec::new(),
            geometry_attribute: None,
        }
    }

    pub fn with_attribute(mut self, name: impl Into<String>, kind: AttributeKind) -> Self {
        let name = name.into();
        if kind == AttributeKind::Geometry && self.geometry_attribute.is_none() {
            self.geometry_attribute = Some(name.clone());
        }
        self.attributes.push(AttributeDescriptor { name, kind });
        self
    }

    /// Add a geometry attribute and make it the default one
    pub fn with_geometry(mut self, name: impl Into<String>) -> Self {
        let name = name.into();
        self.geometry_attribute = Some(name.clone());
        self.attributes.push(AttributeDescriptor {
            name,
            kind: AttributeKind::Geometry,
        });
        self
    }

    pub fn attribute(&self, name: &str) -> Option<&AttributeDescriptor> {
        self.attributes.iter().find(|a| a.name == name)
    }

    pub fn has_attribute(&self, name: &str) -> bool {
        self.attribute(name).is_some()
    }

    pub fn attribute_names(&self) -> impl Iterator<Item = &str> {
        self.attributes.iter().map(|a| a.name.as_str())
    }
}

/// A georeferenced record: identifier plus named attributes
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Record {
    /// Store-assigned identifier, empty until inserted
    pub id: String,
    pub attributes: BTreeMap<String, Value>,
}

impl Record {
    pub fn new() -> Self {
        Self {
            id: String::new(),
            attributes: BTreeMap::new(),
        }
    }

    pub fn with(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.attributes.insert(name.into(), value.into());
        self
    }

    pub fn set(&mut self, name: impl Into<String>, value: impl Into<Value>) {
        self.attributes.insert(name.into(), value.into());
    }

    pub fn get(&self, name: &str) -> Option<&Value> {
        self.attributes.get(name)
    }

    pub fn geometry(&self, name: &str) -> Option<&Geometry<f64>> {
        self.get(name).and_then(Value::as_geometry)
    }
}

impl Default for Record {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SortOrder {
    Ascending,
    Descending,
}

/// Sort key of a query
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SortBy {
    pub property: String,
    pub order: SortOrder,
}

impl SortBy {
    pub fn ascending(property: impl Into<String>) -> Self {
        Self {
            property: property.into(),
            order: SortOrder::Ascending,
        }
    }

    pub fn descending(property: impl Into<String>) -> Self {
        Self {
            property: property.into(),
            order: SortOrder::Descending,
        }
    }
}

impl fmt::Display for SortBy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let dir = match self.order {
            SortOrder::Ascending => "ASC",
            SortOrder::Descending => "DESC",
        };
        write!(f, "{} {}", self.property, dir)
    }
}

/// Sort records in place by a list of sort keys
///
/// Nulls and incomparable values sort last regardless of direction.
pub fn sort_records<T>(items: &mut [T], sort_by: &[SortBy], record: impl Fn(&T) -> &Record) {
    if sort_by.is_empty() {
        return;
    }
    items.sort_by(|a, b| {
        let (ra, rb) = (record(a), record(b));
        for key in sort_by {
            let va = ra.get(&key.property).filter(|v| !v.is_null());
            let vb = rb.get(&key.property).filter(|v| !v.is_null());
            let ord = match (va, vb) {
                (None, None) => Ordering::Equal,
                (None, Some(_)) => Ordering::Greater,
                (Some(_), None) => Ordering::Less,
                (Some(x), Some(y)) => {
                    let ord = x.compare(y).unwrap_or(Ordering::Equal);
                    match key.order {
                        SortOrder::Ascending => ord,
                        SortOrder::Descending => ord.reverse(),
                    }
                }
            };
            if ord != Ordering::Equal {
                return ord;
            }
        }
        Ordering::Equal
    });
}

/// Error type for record store operations
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("Type not found: {0}")]
    TypeNotFound(String),

    #[error("Type already exists: {0}")]
    TypeExists(String),

    #[error("Unknown attribute '{attribute}' for type {type_name}")]
    UnknownAttribute { type_name: String, attribute: String },

    #[error("Invalid schema: {0}")]
    InvalidSchema(String),

    #[error("Transaction {0} is no longer active")]
    TransactionClosed(String),

    #[error("Store is closed")]
    Closed,

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Store backend error: {0}")]
    Backend(String),
}

pub type StoreResult<T> = Result<T, StoreError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_numeric_values_compare_across_kinds() {
        assert_eq!(
            Value::Integer(2).compare(&Value::Double(2.5)),
            Some(Ordering::Less)
        );
        assert!(Value::Integer(3).loosely_equals(&Value::Double(3.0)));
        assert_eq!(Value::Null.compare(&Value::Integer(1)), None);
    }

    #[test]
    fn test_timestamp_compares_with_rfc3339_string() {
        let ts: DateTime<Utc> = "2024-01-02T00:00:00Z".parse().unwrap();
        let other = Value::from("2024-01-01T00:00:00Z");
        assert_eq!(Value::Timestamp(ts).compare(&other), Some(Ordering::Greater));
    }

    #[test]
    fn test_sort_records_puts_nulls_last() {
        let mut records = vec![
            Record::new().with("v", 2i64),
            Record::new(),
            Record::new().with("v", 1i64),
        ];
        sort_records(&mut records, &[SortBy::descending("v")], |r| r);
        assert_eq!(records[0].get("v"), Some(&Value::Integer(2)));
        assert_eq!(records[1].get("v"), Some(&Value::Integer(1)));
        assert!(records[2].get("v").is_none());
    }

    #[test]
    fn test_schema_builder_sets_default_geometry() {
        let schema = Schema::new("tiles")
            .with_attribute("location", AttributeKind::String)
            .with_attribute("the_geom", AttributeKind::Geometry);
        assert_eq!(schema.geometry_attribute.as_deref(), Some("the_geom"));
        assert!(schema.has_attribute("location"));
    }
}
