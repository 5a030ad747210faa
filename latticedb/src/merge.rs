//! CRDT merge algebra for column values (C2).

use crate::value::Value;

/// Per-column merge policy. `NONE` is the default; the others make a
/// column mergeable under `ON CONFLICT MERGE` and on `UPDATE`.
#[derive(Debug, Clone, PartialEq)]
pub enum MergeSpec {
    /// Overwrite: `merge(old, new) = new`.
    None,
    /// Last-writer-wins: right-biased, same as `None` but named distinctly
    /// so the catalog can tell "no merge policy" from "explicit LWW".
    Lww,
    /// Numeric sum, clamped to `[min, max]`. Commutative.
    SumBounded(i64, i64),
    /// Set union. Commutative and idempotent.
    GSet,
}

/// `merge(spec, old, new) -> value`. Pure and deterministic.
pub fn merge(spec: &MergeSpec, old: &Value, new: &Value) -> Value {
    match spec {
        MergeSpec::None | MergeSpec::Lww => new.clone(),
        MergeSpec::SumBounded(min, max) => {
            let (Some(a), Some(b)) = (old.as_f64(), new.as_f64()) else {
                return Value::Null;
            };
            let sum = (a + b) as i64;
            Value::Int(sum.clamp(*min, *max))
        }
        MergeSpec::GSet => {
            let mut items = lift_to_set(old);
            items.extend(lift_to_set(new));
            Value::set_of(items)
        }
    }
}

fn lift_to_set(v: &Value) -> Vec<String> {
    match v {
        Value::Set(items) => items.clone(),
        Value::Text(s) => vec![s.clone()],
        _ => Vec::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lww_is_right_biased() {
        assert_eq!(merge(&MergeSpec::Lww, &Value::Int(1), &Value::Int(2)), Value::Int(2));
    }

    #[test]
    fn sum_bounded_clamps() {
        let spec = MergeSpec::SumBounded(0, 100);
        assert_eq!(merge(&spec, &Value::Int(90), &Value::Int(90)), Value::Int(100));
        assert_eq!(merge(&spec, &Value::Int(-50), &Value::Int(10)), Value::Int(0));
    }

    #[test]
    fn sum_bounded_non_numeric_is_null() {
        let spec = MergeSpec::SumBounded(0, 100);
        assert_eq!(merge(&spec, &Value::Text("x".into()), &Value::Int(1)), Value::Null);
    }

    #[test]
    fn sum_bounded_commutative() {
        let spec = MergeSpec::SumBounded(0, 1000);
        assert_eq!(
            merge(&spec, &Value::Int(3), &Value::Int(4)),
            merge(&spec, &Value::Int(4), &Value::Int(3))
        );
    }

    #[test]
    fn gset_union_commutative_and_idempotent() {
        let a = Value::set_of(vec!["x".into()]);
        let b = Value::set_of(vec!["y".into()]);
        assert_eq!(merge(&MergeSpec::GSet, &a, &b), merge(&MergeSpec::GSet, &b, &a));
        assert_eq!(merge(&MergeSpec::GSet, &a, &a), a);
    }

    #[test]
    fn gset_lifts_text_to_singleton() {
        assert_eq!(
            merge(&MergeSpec::GSet, &Value::Text("a".into()), &Value::Text("b".into())),
            Value::set_of(vec!["a".into(), "b".into()])
        );
    }
}
