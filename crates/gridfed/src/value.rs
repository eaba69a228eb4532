// SPDX-FileCopyrightText: 2025 Caspar Water Company
//
// SPDX-License-Identifier: Apache-2.0

//! Attribute values and coordinate values
//!
//! Attribute dictionaries are string-keyed maps over a closed set of value
//! kinds, so merge and copy operations stay type-checked. Coordinate values
//! are the endpoints stored in the file registry; they only compare when
//! their kinds are compatible.

use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::collections::BTreeMap;
use std::fmt;

use crate::calendar::CfDateTime;

/// Attribute dictionary attached to datasets, coordinates and variables
pub type Attrs = BTreeMap<String, AttrValue>;

/// A single attribute value
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum AttrValue {
    Bool(bool),
    Int(i64),
    Float(f64),
    Text(String),
    List(Vec<AttrValue>),
    Map(BTreeMap<String, AttrValue>),
}

impl AttrValue {
    pub fn as_str(&self) -> Option<&str> {
        match self {
            AttrValue::Text(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            AttrValue::Int(i) => Some(*i as f64),
            AttrValue::Float(f) => Some(*f),
            _ => None,
        }
    }
}

impl From<&str> for AttrValue {
    fn from(s: &str) -> Self {
        AttrValue::Text(s.to_string())
    }
}

impl From<String> for AttrValue {
    fn from(s: String) -> Self {
        AttrValue::Text(s)
    }
}

impl From<i64> for AttrValue {
    fn from(i: i64) -> Self {
        AttrValue::Int(i)
    }
}

impl From<usize> for AttrValue {
    fn from(i: usize) -> Self {
        AttrValue::Int(i64::try_from(i).unwrap_or(i64::MAX))
    }
}

impl From<f64> for AttrValue {
    fn from(f: f64) -> Self {
        AttrValue::Float(f)
    }
}

impl From<bool> for AttrValue {
    fn from(b: bool) -> Self {
        AttrValue::Bool(b)
    }
}

impl<T: Into<AttrValue>> From<Vec<T>> for AttrValue {
    fn from(items: Vec<T>) -> Self {
        AttrValue::List(items.into_iter().map(Into::into).collect())
    }
}

impl fmt::Display for AttrValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AttrValue::Bool(b) => write!(f, "{b}"),
            AttrValue::Int(i) => write!(f, "{i}"),
            AttrValue::Float(x) => write!(f, "{x}"),
            AttrValue::Text(s) => write!(f, "{s:?}"),
            AttrValue::List(items) => {
                let parts: Vec<String> = items.iter().map(ToString::to_string).collect();
                write!(f, "[{}]", parts.join(", "))
            }
            AttrValue::Map(map) => {
                let parts: Vec<String> = map.iter().map(|(k, v)| format!("{k}: {v}")).collect();
                write!(f, "{{{}}}", parts.join(", "))
            }
        }
    }
}

/// Endpoint of a coordinate range along the concatenation dimension
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum CoordValue {
    Int(i64),
    Float(f64),
    Time(CfDateTime),
    Text(String),
}

impl PartialOrd for CoordValue {
    /// `None` when the two values cannot be ordered against each other:
    /// different kinds, timestamps on different calendars, or NaN.
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        match (self, other) {
            (CoordValue::Int(a), CoordValue::Int(b)) => Some(a.cmp(b)),
            (CoordValue::Int(a), CoordValue::Float(b)) => (*a as f64).partial_cmp(b),
            (CoordValue::Float(a), CoordValue::Int(b)) => a.partial_cmp(&(*b as f64)),
            (CoordValue::Float(a), CoordValue::Float(b)) => a.partial_cmp(b),
            (CoordValue::Time(a), CoordValue::Time(b)) if a.calendar() == b.calendar() => {
                Some(a.cmp(b))
            }
            (CoordValue::Text(a), CoordValue::Text(b)) => Some(a.cmp(b)),
            _ => None,
        }
    }
}

impl CoordValue {
    /// Short name of the value kind, used in log output
    pub fn kind_name(&self) -> &'static str {
        match self {
            CoordValue::Int(_) => "int",
            CoordValue::Float(_) => "float",
            CoordValue::Time(_) => "time",
            CoordValue::Text(_) => "text",
        }
    }
}

impl From<i64> for CoordValue {
    fn from(i: i64) -> Self {
        CoordValue::Int(i)
    }
}

impl From<f64> for CoordValue {
    fn from(f: f64) -> Self {
        CoordValue::Float(f)
    }
}

impl From<CfDateTime> for CoordValue {
    fn from(t: CfDateTime) -> Self {
        CoordValue::Time(t)
    }
}

impl From<&str> for CoordValue {
    fn from(s: &str) -> Self {
        CoordValue::Text(s.to_string())
    }
}

impl fmt::Display for CoordValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CoordValue::Int(i) => write!(f, "{i}"),
            CoordValue::Float(x) => write!(f, "{x}"),
            CoordValue::Time(t) => write!(f, "{t}"),
            CoordValue::Text(s) => write!(f, "{s}"),
        }
    }
}
