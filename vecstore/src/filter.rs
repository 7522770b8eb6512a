use std::fmt;

use crate::record::Record;

/// Scalar column addressable by a [`Filter`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Field {
    Id,
    Filename,
}

/// Literal compared against a [`Field`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Value {
    Int(i64),
    Str(String),
}

impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Value::Int(v)
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Value::Str(v.to_string())
    }
}

impl From<String> for Value {
    fn from(v: String) -> Self {
        Value::Str(v)
    }
}

/// Structured predicate over collection records.
///
/// Comparisons between a field and a literal of the wrong type never
/// match; there is no implicit conversion.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Filter {
    /// Matches every record.
    All,
    /// `field == value`.
    Eq { field: Field, value: Value },
    /// `field in values`.
    In { field: Field, values: Vec<Value> },
}

impl Filter {
    pub fn eq(field: Field, value: impl Into<Value>) -> Self {
        Filter::Eq {
            field,
            value: value.into(),
        }
    }

    /// Shorthand for `Filter::eq(Field::Id, id)`.
    pub fn id(id: i64) -> Self {
        Filter::eq(Field::Id, id)
    }

    /// Shorthand for `Filter::eq(Field::Filename, name)`.
    pub fn filename(name: &str) -> Self {
        Filter::eq(Field::Filename, name)
    }

    pub fn one_of<V: Into<Value>>(field: Field, values: impl IntoIterator<Item = V>) -> Self {
        Filter::In {
            field,
            values: values.into_iter().map(Into::into).collect(),
        }
    }

    pub fn matches(&self, rec: &Record) -> bool {
        match self {
            Filter::All => true,
            Filter::Eq { field, value } => field_equals(rec, *field, value),
            Filter::In { field, values } => values.iter().any(|v| field_equals(rec, *field, v)),
        }
    }

    /// Returns the single primary key this filter pins, if any, so callers
    /// can use a point lookup instead of a scan.
    pub(crate) fn point_id(&self) -> Option<i64> {
        match self {
            Filter::Eq {
                field: Field::Id,
                value: Value::Int(id),
            } => Some(*id),
            _ => None,
        }
    }
}

fn field_equals(rec: &Record, field: Field, value: &Value) -> bool {
    match (field, value) {
        (Field::Id, Value::Int(v)) => rec.id == *v,
        (Field::Filename, Value::Str(v)) => rec.filename.as_deref() == Some(v.as_str()),
        _ => false,
    }
}

impl fmt::Display for Field {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Field::Id => write!(f, "id"),
            Field::Filename => write!(f, "filename"),
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Int(v) => write!(f, "{v}"),
            Value::Str(v) => write!(f, "{v:?}"),
        }
    }
}

impl fmt::Display for Filter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Filter::All => write!(f, "*"),
            Filter::Eq { field, value } => write!(f, "{field} == {value}"),
            Filter::In { field, values } => {
                write!(f, "{field} in [")?;
                for (i, v) in values.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{v}")?;
                }
                write!(f, "]")
            }
        }
    }
}
