use std::cmp::Ordering;
use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::context::Record;

/// Well-known filter-input keys of the data API.
pub mod filter_keys {
    pub const AND: &str = "and";
    pub const OR: &str = "or";
    pub const NOT: &str = "not";

    pub const EQ: &str = "eq";
    pub const NE: &str = "ne";
    pub const CONTAINS: &str = "contains";
    pub const NOT_CONTAINS: &str = "notContains";
    pub const IN: &str = "in";
    pub const NOT_IN: &str = "notIn";
    pub const GT: &str = "gt";
    pub const GE: &str = "ge";
    pub const LT: &str = "lt";
    pub const LE: &str = "le";
    pub const BEGINS_WITH: &str = "beginsWith";
    pub const BETWEEN: &str = "between";
}

/// Error while parsing a caller-supplied filter input.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum FilterInputError {
    #[error("filter input must be an object, got: {0}")]
    NotAnObject(String),

    #[error("'{key}' expects {expected}")]
    InvalidOperand { key: String, expected: &'static str },

    #[error("unsupported filter operator '{op}' on field '{field}'")]
    UnsupportedOperator { field: String, op: String },
}

/// Equality or containment predicate on one record field.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct FieldFilter {
    /// Record field name (e.g. `owner`, `groups`).
    field: String,
    /// The value to compare against.
    value: Value,
}

impl FieldFilter {
    #[must_use]
    pub fn new(field: impl Into<String>, value: impl Into<Value>) -> Self {
        Self {
            field: field.into(),
            value: value.into(),
        }
    }

    #[inline]
    #[must_use]
    pub fn field(&self) -> &str {
        &self.field
    }

    #[inline]
    #[must_use]
    pub fn value(&self) -> &Value {
        &self.value
    }
}

/// Set membership predicate: `field IN (values)`.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SetFilter {
    field: String,
    values: Vec<Value>,
}

impl SetFilter {
    #[must_use]
    pub fn new<V: Into<Value>>(field: impl Into<String>, values: impl IntoIterator<Item = V>) -> Self {
        Self {
            field: field.into(),
            values: values.into_iter().map(Into::into).collect(),
        }
    }

    #[inline]
    #[must_use]
    pub fn field(&self) -> &str {
        &self.field
    }

    #[inline]
    #[must_use]
    pub fn values(&self) -> &[Value] {
        &self.values
    }
}

/// Ordering operators carried through from caller-supplied filters.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CompareOp {
    Gt,
    Ge,
    Lt,
    Le,
    BeginsWith,
}

impl CompareOp {
    fn input_key(self) -> &'static str {
        match self {
            Self::Gt => filter_keys::GT,
            Self::Ge => filter_keys::GE,
            Self::Lt => filter_keys::LT,
            Self::Le => filter_keys::LE,
            Self::BeginsWith => filter_keys::BEGINS_WITH,
        }
    }
}

/// Ordering predicate: `field <op> value`.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct CompareFilter {
    field: String,
    op: CompareOp,
    value: Value,
}

impl CompareFilter {
    #[inline]
    #[must_use]
    pub fn field(&self) -> &str {
        &self.field
    }

    #[inline]
    #[must_use]
    pub fn op(&self) -> CompareOp {
        self.op
    }

    #[inline]
    #[must_use]
    pub fn value(&self) -> &Value {
        &self.value
    }
}

/// A boolean predicate tree over record field values.
///
/// Authorization filters only ever use [`FilterExpr::Eq`], [`FilterExpr::Contains`],
/// [`FilterExpr::In`], [`FilterExpr::And`] and [`FilterExpr::Or`]. `Not` and
/// `Compare` exist so that caller-supplied subscription filters can be merged
/// without losing information.
///
/// # Examples
///
/// ```
/// use authz_security::FilterExpr;
/// use serde_json::json;
///
/// let filter = FilterExpr::or_all(vec![
///     FilterExpr::contains("groups", "admin"),
///     FilterExpr::contains("groups", "eng"),
/// ])
/// .unwrap();
///
/// let record = json!({ "groups": ["eng"] });
/// assert!(filter.matches(record.as_object().unwrap()));
/// assert_eq!(filter.clause_count(), 2);
/// ```
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "op", content = "args", rename_all = "snake_case")]
pub enum FilterExpr {
    /// `field = value`
    Eq(FieldFilter),
    /// List field holds `value`, or string field has `value` as a substring.
    Contains(FieldFilter),
    /// `field IN (values)`
    In(SetFilter),
    /// Ordering comparison from a caller-supplied filter.
    Compare(CompareFilter),
    Not(Box<FilterExpr>),
    And(Vec<FilterExpr>),
    Or(Vec<FilterExpr>),
}

impl FilterExpr {
    #[must_use]
    pub fn eq(field: impl Into<String>, value: impl Into<Value>) -> Self {
        Self::Eq(FieldFilter::new(field, value))
    }

    #[must_use]
    pub fn contains(field: impl Into<String>, value: impl Into<Value>) -> Self {
        Self::Contains(FieldFilter::new(field, value))
    }

    #[must_use]
    pub fn r#in<V: Into<Value>>(field: impl Into<String>, values: impl IntoIterator<Item = V>) -> Self {
        Self::In(SetFilter::new(field, values))
    }

    #[must_use]
    pub fn compare(field: impl Into<String>, op: CompareOp, value: impl Into<Value>) -> Self {
        Self::Compare(CompareFilter {
            field: field.into(),
            op,
            value: value.into(),
        })
    }

    #[must_use]
    pub fn negate(inner: Self) -> Self {
        Self::Not(Box::new(inner))
    }

    /// OR of `clauses`; a single clause is returned as-is, none yields `None`.
    #[must_use]
    pub fn or_all(mut clauses: Vec<Self>) -> Option<Self> {
        match clauses.len() {
            0 => None,
            1 => clauses.pop(),
            _ => Some(Self::Or(clauses)),
        }
    }

    /// AND of `clauses`; a single clause is returned as-is, none yields `None`.
    #[must_use]
    pub fn and_all(mut clauses: Vec<Self>) -> Option<Self> {
        match clauses.len() {
            0 => None,
            1 => clauses.pop(),
            _ => Some(Self::And(clauses)),
        }
    }

    /// Number of leaf predicates in the tree.
    #[must_use]
    pub fn clause_count(&self) -> usize {
        match self {
            Self::Eq(_) | Self::Contains(_) | Self::In(_) | Self::Compare(_) => 1,
            Self::Not(inner) => inner.clause_count(),
            Self::And(children) | Self::Or(children) => {
                children.iter().map(Self::clause_count).sum()
            }
        }
    }

    /// Evaluate the predicate against a record. Missing fields read as `null`.
    #[must_use]
    pub fn matches(&self, record: &Record) -> bool {
        match self {
            Self::Eq(f) => field_value(record, f.field()) == f.value(),
            Self::Contains(f) => value_contains(field_value(record, f.field()), f.value()),
            Self::In(f) => {
                let actual = field_value(record, f.field());
                f.values().iter().any(|v| v == actual)
            }
            Self::Compare(f) => compare_matches(field_value(record, f.field()), f.op(), f.value()),
            Self::Not(inner) => !inner.matches(record),
            Self::And(children) => children.iter().all(|c| c.matches(record)),
            Self::Or(children) => children.iter().any(|c| c.matches(record)),
        }
    }

    /// Parse the data API's filter-input object.
    ///
    /// `null` and `{}` mean "no filter" and yield `Ok(None)`.
    ///
    /// # Errors
    ///
    /// Returns [`FilterInputError`] for non-object input, malformed operands,
    /// or operators this crate does not model.
    pub fn from_input(input: &Value) -> Result<Option<Self>, FilterInputError> {
        match input {
            Value::Null => Ok(None),
            Value::Object(map) => parse_object(map),
            other => Err(FilterInputError::NotAnObject(other.to_string())),
        }
    }

    /// Render the predicate in the data API's filter-input shape.
    #[must_use]
    pub fn to_input(&self) -> Value {
        match self {
            Self::Eq(f) => field_input(f.field(), filter_keys::EQ, f.value().clone()),
            Self::Contains(f) => field_input(f.field(), filter_keys::CONTAINS, f.value().clone()),
            Self::In(f) => field_input(f.field(), filter_keys::IN, Value::Array(f.values().to_vec())),
            Self::Compare(f) => field_input(f.field(), f.op().input_key(), f.value().clone()),
            Self::Not(inner) => single_entry(filter_keys::NOT, inner.to_input()),
            Self::And(children) => single_entry(
                filter_keys::AND,
                Value::Array(children.iter().map(Self::to_input).collect()),
            ),
            Self::Or(children) => single_entry(
                filter_keys::OR,
                Value::Array(children.iter().map(Self::to_input).collect()),
            ),
        }
    }
}

impl fmt::Display for FilterExpr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_input())
    }
}

fn field_value<'a>(record: &'a Record, field: &str) -> &'a Value {
    record.get(field).unwrap_or(&Value::Null)
}

fn value_contains(actual: &Value, needle: &Value) -> bool {
    match (actual, needle) {
        (Value::Array(items), _) => items.iter().any(|item| item == needle),
        (Value::String(haystack), Value::String(n)) => haystack.contains(n.as_str()),
        _ => false,
    }
}

fn compare_matches(actual: &Value, op: CompareOp, expected: &Value) -> bool {
    if op == CompareOp::BeginsWith {
        return match (actual, expected) {
            (Value::String(a), Value::String(prefix)) => a.starts_with(prefix.as_str()),
            _ => false,
        };
    }
    let ordering = match (actual, expected) {
        (Value::Number(a), Value::Number(b)) => match (a.as_f64(), b.as_f64()) {
            (Some(a), Some(b)) => a.partial_cmp(&b),
            _ => None,
        },
        (Value::String(a), Value::String(b)) => Some(a.cmp(b)),
        _ => None,
    };
    let Some(ordering) = ordering else {
        return false;
    };
    match op {
        CompareOp::Gt => ordering == Ordering::Greater,
        CompareOp::Ge => ordering != Ordering::Less,
        CompareOp::Lt => ordering == Ordering::Less,
        CompareOp::Le => ordering != Ordering::Greater,
        CompareOp::BeginsWith => false,
    }
}

fn parse_object(map: &Map<String, Value>) -> Result<Option<FilterExpr>, FilterInputError> {
    let mut clauses = Vec::with_capacity(map.len());
    for (key, operand) in map {
        match key.as_str() {
            filter_keys::AND | filter_keys::OR => {
                let Value::Array(items) = operand else {
                    return Err(FilterInputError::InvalidOperand {
                        key: key.clone(),
                        expected: "an array of filter objects",
                    });
                };
                let mut children = Vec::with_capacity(items.len());
                for item in items {
                    if let Some(child) = FilterExpr::from_input(item)? {
                        children.push(child);
                    }
                }
                let group = if key == filter_keys::AND {
                    FilterExpr::and_all(children)
                } else {
                    FilterExpr::or_all(children)
                };
                clauses.extend(group);
            }
            filter_keys::NOT => {
                if let Some(inner) = FilterExpr::from_input(operand)? {
                    clauses.push(FilterExpr::negate(inner));
                }
            }
            field => clauses.extend(parse_field(field, operand)?),
        }
    }
    Ok(FilterExpr::and_all(clauses))
}

fn parse_field(field: &str, operand: &Value) -> Result<Vec<FilterExpr>, FilterInputError> {
    let Value::Object(ops) = operand else {
        return Err(FilterInputError::InvalidOperand {
            key: field.to_owned(),
            expected: "an object of comparison operators",
        });
    };
    let mut clauses = Vec::with_capacity(ops.len());
    for (op, value) in ops {
        let clause = match op.as_str() {
            filter_keys::EQ => FilterExpr::eq(field, value.clone()),
            filter_keys::NE => FilterExpr::negate(FilterExpr::eq(field, value.clone())),
            filter_keys::CONTAINS => FilterExpr::contains(field, value.clone()),
            filter_keys::NOT_CONTAINS => {
                FilterExpr::negate(FilterExpr::contains(field, value.clone()))
            }
            filter_keys::IN => FilterExpr::r#in(field, array_operand(field, op, value)?),
            filter_keys::NOT_IN => {
                FilterExpr::negate(FilterExpr::r#in(field, array_operand(field, op, value)?))
            }
            filter_keys::GT => FilterExpr::compare(field, CompareOp::Gt, value.clone()),
            filter_keys::GE => FilterExpr::compare(field, CompareOp::Ge, value.clone()),
            filter_keys::LT => FilterExpr::compare(field, CompareOp::Lt, value.clone()),
            filter_keys::LE => FilterExpr::compare(field, CompareOp::Le, value.clone()),
            filter_keys::BEGINS_WITH => {
                FilterExpr::compare(field, CompareOp::BeginsWith, value.clone())
            }
            filter_keys::BETWEEN => match array_operand(field, op, value)?.as_slice() {
                [low, high] => FilterExpr::And(vec![
                    FilterExpr::compare(field, CompareOp::Ge, low.clone()),
                    FilterExpr::compare(field, CompareOp::Le, high.clone()),
                ]),
                _ => {
                    return Err(FilterInputError::InvalidOperand {
                        key: format!("{field}.{op}"),
                        expected: "a two-element array",
                    });
                }
            },
            _ => {
                return Err(FilterInputError::UnsupportedOperator {
                    field: field.to_owned(),
                    op: op.clone(),
                });
            }
        };
        clauses.push(clause);
    }
    Ok(clauses)
}

fn array_operand(field: &str, op: &str, value: &Value) -> Result<Vec<Value>, FilterInputError> {
    match value {
        Value::Array(items) => Ok(items.clone()),
        _ => Err(FilterInputError::InvalidOperand {
            key: format!("{field}.{op}"),
            expected: "an array",
        }),
    }
}

fn field_input(field: &str, op: &str, value: Value) -> Value {
    single_entry(field, single_entry(op, value))
}

fn single_entry(key: &str, value: Value) -> Value {
    let mut map = Map::with_capacity(1);
    map.insert(key.to_owned(), value);
    Value::Object(map)
}
