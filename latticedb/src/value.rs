use std::cmp::Ordering;
use std::fmt;

use crate::error::{CResult, Error};

/// A scalar or container value. Every cell in a row version, every literal
/// in the AST, and every accumulator in the executor is one of these six
/// variants. `Null` carries no type of its own; it is accepted by any
/// column.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Null,
    Int(i64),
    Double(f64),
    Text(String),
    /// An ordered set of text, kept sorted and deduplicated so that two
    /// sets built from the same elements in different orders compare equal.
    Set(Vec<String>),
    Vector(Vec<f64>),
}

/// The declared type of a column, or the classification of a [`Value`].
/// `Vector` carries the declared dimension so coercion can check it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ValueType {
    Int,
    Double,
    Text,
    Set,
    Vector(u32),
}

impl fmt::Display for ValueType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ValueType::Int => write!(f, "INT"),
            ValueType::Double => write!(f, "DOUBLE"),
            ValueType::Text => write!(f, "TEXT"),
            ValueType::Set => write!(f, "SET<TEXT>"),
            ValueType::Vector(dim) => write!(f, "VECTOR<{dim}>"),
        }
    }
}

impl Value {
    pub fn set_of(mut items: Vec<String>) -> Value {
        items.sort();
        items.dedup();
        Value::Set(items)
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    /// The type this value currently holds, or `None` for `Null` (which has
    /// no type of its own).
    pub fn type_of(&self) -> Option<ValueType> {
        match self {
            Value::Null => None,
            Value::Int(_) => Some(ValueType::Int),
            Value::Double(_) => Some(ValueType::Double),
            Value::Text(_) => Some(ValueType::Text),
            Value::Set(_) => Some(ValueType::Set),
            Value::Vector(v) => Some(ValueType::Vector(v.len() as u32)),
        }
    }

    /// Coerces `self` into `target`, per the Data Model coercion table.
    /// Returns `Null` whenever no coercion path applies.
    pub fn coerce_to(&self, target: ValueType) -> Value {
        if self.is_null() {
            return Value::Null;
        }
        match (self, target) {
            (Value::Int(i), ValueType::Int) => Value::Int(*i),
            (Value::Double(d), ValueType::Int) => Value::Int(*d as i64),
            (Value::Text(s), ValueType::Int) => {
                s.trim().parse::<i64>().map(Value::Int).unwrap_or(Value::Null)
            }

            (Value::Double(d), ValueType::Double) => Value::Double(*d),
            (Value::Int(i), ValueType::Double) => Value::Double(*i as f64),
            (Value::Text(s), ValueType::Double) => {
                s.trim().parse::<f64>().map(Value::Double).unwrap_or(Value::Null)
            }

            (Value::Text(s), ValueType::Text) => Value::Text(s.clone()),
            (Value::Int(_), ValueType::Text) | (Value::Double(_), ValueType::Text) => {
                Value::Text(self.canonical_text())
            }

            (Value::Set(s), ValueType::Set) => Value::Set(s.clone()),
            (Value::Text(s), ValueType::Set) => Value::set_of(vec![s.clone()]),

            (Value::Vector(v), ValueType::Vector(dim)) if v.len() as u32 == dim => {
                Value::Vector(v.clone())
            }

            _ => Value::Null,
        }
    }

    /// The canonical textual form used when coercing a scalar to TEXT and
    /// when rendering non-null results. `Null` is rendered as the literal
    /// string `NULL` by [`Value::display_string`], not here.
    pub fn canonical_text(&self) -> String {
        match self {
            Value::Null => String::new(),
            Value::Int(i) => i.to_string(),
            Value::Double(d) => format_double(*d),
            Value::Text(s) => s.clone(),
            Value::Set(items) => format!("{{{}}}", items.join(",")),
            Value::Vector(v) => {
                format!("[{}]", v.iter().map(|f| format_double(*f)).collect::<Vec<_>>().join(","))
            }
        }
    }

    /// Rendering form for query results and snapshot output.
    pub fn display_string(&self) -> String {
        match self {
            Value::Null => "NULL".to_string(),
            other => other.canonical_text(),
        }
    }

    /// Total order within compatible type pairs. `Null` never orders:
    /// every comparison involving it returns `None`, so `<`, `>`, `=` and
    /// friends are all false for it (only `IS [NOT] NULL` sees it).
    pub fn compare(&self, other: &Value) -> Option<Ordering> {
        match (self, other) {
            (Value::Null, _) | (_, Value::Null) => None,
            (Value::Int(a), Value::Int(b)) => a.partial_cmp(b),
            (Value::Double(a), Value::Double(b)) => a.partial_cmp(b),
            (Value::Int(a), Value::Double(b)) => (*a as f64).partial_cmp(b),
            (Value::Double(a), Value::Int(b)) => a.partial_cmp(&(*b as f64)),
            (Value::Text(a), Value::Text(b)) => a.partial_cmp(b),
            _ => None,
        }
    }

    pub fn equals(&self, other: &Value) -> bool {
        self.compare(other) == Some(Ordering::Equal)
    }

    /// Tagged canonical key used for join hash tables and GROUP BY keys, so
    /// that `Int(1)` and `Text("1")` can never collide.
    pub fn canonical_key(&self) -> String {
        match self {
            Value::Null => "n:".to_string(),
            Value::Int(i) => format!("i:{i}"),
            Value::Double(d) => format!("f:{}", format_double(*d)),
            Value::Text(s) => format!("s:{s}"),
            Value::Set(items) => format!("g:{}", items.join(",")),
            Value::Vector(v) => {
                format!("v:{}", v.iter().map(|f| format_double(*f)).collect::<Vec<_>>().join(","))
            }
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Int(i) => Some(*i as f64),
            Value::Double(d) => Some(*d),
            _ => None,
        }
    }

    pub fn l2_distance(&self, other: &Value) -> CResult<f64> {
        match (self, other) {
            (Value::Vector(a), Value::Vector(b)) if a.len() == b.len() => Ok(a
                .iter()
                .zip(b.iter())
                .map(|(x, y)| (x - y).powi(2))
                .sum::<f64>()
                .sqrt()),
            _ => Err(Error::Type("DISTANCE requires two vectors of equal dimension".into())),
        }
    }
}

/// Shortest round-tripping decimal form for a float, matching Rust's
/// `Display` impl for `f64` (which already produces the shortest
/// representation that reparses to the same value).
fn format_double(d: f64) -> String {
    format!("{d}")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn coerce_text_to_int() {
        assert_eq!(Value::Text("42".into()).coerce_to(ValueType::Int), Value::Int(42));
        assert_eq!(Value::Text("abc".into()).coerce_to(ValueType::Int), Value::Null);
    }

    #[test]
    fn coerce_double_truncates_to_int() {
        assert_eq!(Value::Double(3.9).coerce_to(ValueType::Int), Value::Int(3));
    }

    #[test]
    fn coerce_text_to_set_lifts_singleton() {
        assert_eq!(
            Value::Text("a".into()).coerce_to(ValueType::Set),
            Value::Set(vec!["a".into()])
        );
    }

    #[test]
    fn vector_dimension_mismatch_coerces_to_null() {
        assert_eq!(Value::Vector(vec![1.0, 2.0]).coerce_to(ValueType::Vector(3)), Value::Null);
    }

    #[test]
    fn null_never_orders() {
        assert_eq!(Value::Null.compare(&Value::Int(1)), None);
        assert!(!Value::Null.equals(&Value::Null));
    }

    #[test]
    fn int_and_double_cross_compare() {
        assert_eq!(Value::Int(2).compare(&Value::Double(2.0)), Some(Ordering::Equal));
    }

    #[test]
    fn canonical_key_tags_by_variant() {
        assert_ne!(Value::Int(1).canonical_key(), Value::Text("1".into()).canonical_key());
    }

    #[test]
    fn set_of_sorts_and_dedups() {
        assert_eq!(
            Value::set_of(vec!["b".into(), "a".into(), "a".into()]),
            Value::Set(vec!["a".into(), "b".into()])
        );
    }

    #[test]
    fn set_display_is_sorted_braces() {
        assert_eq!(Value::set_of(vec!["b".into(), "a".into()]).display_string(), "{a,b}");
    }

    #[test]
    fn l2_distance_zero_for_equal_vectors() {
        let v = Value::Vector(vec![1.0, 1.0]);
        assert_eq!(v.l2_distance(&v).unwrap(), 0.0);
    }
}
