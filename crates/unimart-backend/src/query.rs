use std::cmp::Ordering;

use chrono::{DateTime, Utc};
use serde_json::Value;
use unimart_shared::constants::TIMESTAMP_FIELDS;

use crate::document::Document;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Ascending,
    Descending,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Filter {
    /// `field == value`
    Eq { field: String, value: Value },
    /// The array at `field` contains `value`.
    ArrayContains { field: String, value: Value },
}

#[derive(Debug, Clone, PartialEq)]
pub struct OrderBy {
    pub field: String,
    pub direction: Direction,
}

/// A query over one collection. Filters are ANDed. Like the hosted
/// database, ordering on a field drops documents that lack it.
#[derive(Debug, Clone, PartialEq)]
pub struct Query {
    pub collection: String,
    pub filters: Vec<Filter>,
    pub order_by: Option<OrderBy>,
    pub limit: Option<usize>,
}

impl Query {
    pub fn collection(name: impl Into<String>) -> Self {
        Self {
            collection: name.into(),
            filters: Vec::new(),
            order_by: None,
            limit: None,
        }
    }

    pub fn where_eq(mut self, field: impl Into<String>, value: impl Into<Value>) -> Self {
        self.filters.push(Filter::Eq {
            field: field.into(),
            value: value.into(),
        });
        self
    }

    pub fn where_array_contains(mut self, field: impl Into<String>, value: impl Into<Value>) -> Self {
        self.filters.push(Filter::ArrayContains {
            field: field.into(),
            value: value.into(),
        });
        self
    }

    pub fn order_by(mut self, field: impl Into<String>, direction: Direction) -> Self {
        self.order_by = Some(OrderBy {
            field: field.into(),
            direction,
        });
        self
    }

    pub fn limit(mut self, n: usize) -> Self {
        self.limit = Some(n);
        self
    }

    pub fn matches(&self, doc: &Document) -> bool {
        let filtered = self.filters.iter().all(|f| match f {
            Filter::Eq { field, value } => doc.field(field) == Some(value),
            Filter::ArrayContains { field, value } => doc
                .field(field)
                .and_then(Value::as_array)
                .is_some_and(|items| items.contains(value)),
        });
        let ordered = self
            .order_by
            .as_ref()
            .map_or(true, |o| doc.field(&o.field).is_some_and(|v| !v.is_null()));
        filtered && ordered
    }

    /// Evaluate the query against an in-memory set of documents.
    pub fn apply(&self, docs: impl IntoIterator<Item = Document>) -> Vec<Document> {
        let mut out: Vec<Document> = docs.into_iter().filter(|d| self.matches(d)).collect();

        if let Some(order) = &self.order_by {
            out.sort_by(|a, b| {
                let ord = compare_values(&order.field, a.field(&order.field), b.field(&order.field));
                match order.direction {
                    Direction::Ascending => ord,
                    Direction::Descending => ord.reverse(),
                }
            });
        }

        if let Some(n) = self.limit {
            out.truncate(n);
        }
        out
    }
}

/// Total order over the values of `field` as the document database sorts
/// them: null < bool < number < timestamp < string < array < map. Values of
/// timestamp fields compare as instants.
pub fn compare_values(field: &str, a: Option<&Value>, b: Option<&Value>) -> Ordering {
    match (a, b) {
        (None, None) => Ordering::Equal,
        (None, Some(_)) => Ordering::Less,
        (Some(_), None) => Ordering::Greater,
        (Some(a), Some(b)) => {
            let (ra, rb) = (rank(field, a), rank(field, b));
            if ra != rb {
                return ra.cmp(&rb);
            }
            match (a, b) {
                (Value::Bool(x), Value::Bool(y)) => x.cmp(y),
                (Value::Number(x), Value::Number(y)) => {
                    let (x, y) = (x.as_f64().unwrap_or(0.0), y.as_f64().unwrap_or(0.0));
                    x.partial_cmp(&y).unwrap_or(Ordering::Equal)
                }
                (Value::String(x), Value::String(y)) => match (as_timestamp(x), as_timestamp(y)) {
                    (Some(tx), Some(ty)) => tx.cmp(&ty),
                    _ => x.cmp(y),
                },
                (Value::Array(x), Value::Array(y)) => x.len().cmp(&y.len()),
                (Value::Object(x), Value::Object(y)) => x.len().cmp(&y.len()),
                _ => Ordering::Equal,
            }
        }
    }
}

fn rank(field: &str, v: &Value) -> u8 {
    match v {
        Value::Null => 0,
        Value::Bool(_) => 1,
        Value::Number(_) => 2,
        Value::String(s) if is_timestamp_field(field) && as_timestamp(s).is_some() => 3,
        Value::String(_) => 4,
        Value::Array(_) => 5,
        Value::Object(_) => 6,
    }
}

pub fn is_timestamp_field(path: &str) -> bool {
    TIMESTAMP_FIELDS.contains(&path)
}

/// An RFC 3339 UTC instant written with a `T` separator.
pub fn as_timestamp(s: &str) -> Option<DateTime<Utc>> {
    if s.len() < 20 || s.as_bytes().get(10) != Some(&b'T') {
        return None;
    }
    DateTime::parse_from_rfc3339(s)
        .ok()
        .map(|dt| dt.with_timezone(&Utc))
}
