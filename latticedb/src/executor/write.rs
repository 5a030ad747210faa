//! The write path: builds a [`StagedOp`] describing a statement's effect
//! on a single table, without mutating it (§4.7.2, §4.7.3). The caller
//! (the engine) either applies the op immediately or defers it into the
//! active transaction's staged list.

use crate::catalog::TableDef;
use crate::error::{CResult, Error};
use crate::merge::{merge, MergeSpec};
use crate::parser::ast::Cond;
use crate::store::{RowVersion, Table, DEFAULT_VALID_TO, TX_INFINITY};
use crate::transaction::StagedOp;
use crate::value::Value;

fn row_id_of(schema: &TableDef, data: &[Value]) -> CResult<String> {
    let pk = schema.pk_index.ok_or_else(|| Error::Schema(format!("table {} has no primary key", schema.name)))?;
    match &data[pk] {
        Value::Int(i) => Ok(i.to_string()),
        Value::Text(s) => Ok(s.clone()),
        Value::Null => Err(Error::Type("insert without a primary key value".into())),
        other => Err(Error::Type(format!("primary key value has unexpected type {other:?}"))),
    }
}

/// Coerces each supplied value to its column's declared type, per the
/// Data Model's coercion table (spec.md §3). A coercion that finds no
/// applicable rule yields `NULL`, same as the table specifies — it is
/// not an error, and flows on into the merge/keep-old path of INSERT and
/// UPDATE (a merge that lands on `NULL` retains the old value). The one
/// coercion failure that *is* a hard error is a `VECTOR` column fed a
/// vector of the wrong length: §7 lists "vector dimension mismatch" as
/// its own Type error, distinct from the general coercion-yields-NULL
/// rule.
fn coerce_row(schema: &TableDef, columns: &[String], values: &[Value]) -> CResult<Vec<Value>> {
    let mut data = vec![Value::Null; schema.columns.len()];
    for (col_name, val) in columns.iter().zip(values) {
        let idx = schema
            .column_index(col_name)
            .ok_or_else(|| Error::Schema(format!("unknown column {col_name} in table {}", schema.name)))?;
        let col = &schema.columns[idx];
        if let (Value::Vector(v), crate::value::ValueType::Vector(dim)) = (val, col.ty) {
            if v.len() as u32 != dim {
                return Err(Error::Type(format!(
                    "column {} expects a vector of dimension {dim}, got {}",
                    col.name,
                    v.len()
                )));
            }
        }
        data[idx] = val.coerce_to(col.ty);
    }
    Ok(data)
}

/// `INSERT INTO t (cols) VALUES (..), (..) [ON CONFLICT MERGE]`.
pub fn insert(
    table: &Table,
    tx: u64,
    columns: &[String],
    rows: &[Vec<Value>],
    on_conflict_merge: bool,
) -> CResult<(StagedOp, usize)> {
    let schema = &table.schema;
    let column_names = if columns.is_empty() {
        schema.columns.iter().map(|c| c.name.clone()).collect::<Vec<_>>()
    } else {
        columns.to_vec()
    };

    let mut appended = Vec::new();
    let mut close_indices = Vec::new();
    let mut prev_tx_to = Vec::new();

    for tuple in rows {
        if tuple.len() != column_names.len() {
            return Err(Error::Parse(format!(
                "expected {} values, found {}",
                column_names.len(),
                tuple.len()
            )));
        }
        let data = coerce_row(schema, &column_names, tuple)?;
        let row_id = row_id_of(schema, &data)?;

        match table.current_version(&row_id) {
            Some((idx, current)) if on_conflict_merge && schema.mergeable => {
                let mut merged = Vec::with_capacity(data.len());
                for (i, col) in schema.columns.iter().enumerate() {
                    let new_val = merge(&col.merge, &current.data[i], &data[i]);
                    merged.push(if new_val.is_null() { current.data[i].clone() } else { new_val });
                }
                appended.push(RowVersion {
                    row_id,
                    tx_from: tx,
                    tx_to: TX_INFINITY,
                    valid_from: current.valid_from.clone(),
                    valid_to: current.valid_to.clone(),
                    data: merged,
                });
                close_indices.push(idx);
                prev_tx_to.push(current.tx_to);
            }
            Some((idx, current)) => {
                let mut combined = Vec::with_capacity(data.len());
                for (i, v) in data.iter().enumerate() {
                    combined.push(if v.is_null() { current.data[i].clone() } else { v.clone() });
                }
                appended.push(RowVersion {
                    row_id,
                    tx_from: tx,
                    tx_to: TX_INFINITY,
                    valid_from: current.valid_from.clone(),
                    valid_to: current.valid_to.clone(),
                    data: combined,
                });
                close_indices.push(idx);
                prev_tx_to.push(current.tx_to);
            }
            None => {
                appended.push(RowVersion {
                    row_id,
                    tx_from: tx,
                    tx_to: TX_INFINITY,
                    valid_from: chrono::Utc::now().format("%Y-%m-%dT%H:%M:%SZ").to_string(),
                    valid_to: DEFAULT_VALID_TO.to_string(),
                    data,
                });
            }
        }
    }

    let affected = appended.len();
    let op = if close_indices.is_empty() {
        StagedOp::Append { table: schema.name.clone(), versions: appended }
    } else {
        StagedOp::AppendAndClose {
            table: schema.name.clone(),
            versions: appended,
            close_indices,
            tx_to: tx,
            prev_tx_to,
        }
    };
    Ok((op, affected))
}

/// `UPDATE t SET col = lit, .. [VALID PERIOD (..)] [WHERE ..]`.
pub fn update(
    table: &Table,
    tx: u64,
    assignments: &[(String, Value)],
    valid_period: &Option<(String, String)>,
    filter: &[Cond],
) -> CResult<(StagedOp, usize)> {
    let schema = &table.schema;
    let mut assignment_idx = Vec::with_capacity(assignments.len());
    for (name, _) in assignments {
        let idx = schema
            .column_index(name)
            .ok_or_else(|| Error::Schema(format!("unknown column {name} in table {}", schema.name)))?;
        assignment_idx.push(idx);
    }

    let mut appended = Vec::new();
    let mut close_indices = Vec::new();
    let mut prev_tx_to = Vec::new();

    for (idx, current) in table.current_version_iter() {
        if !super::read::matches_single(schema, current, filter)? {
            continue;
        }

        let mut data = current.data.clone();
        for ((_, new_val), &col_idx) in assignments.iter().zip(&assignment_idx) {
            let col = &schema.columns[col_idx];
            let coerced = new_val.coerce_to(col.ty);
            data[col_idx] = if col.merge != MergeSpec::None && schema.mergeable {
                let merged = merge(&col.merge, &current.data[col_idx], &coerced);
                if merged.is_null() {
                    current.data[col_idx].clone()
                } else {
                    merged
                }
            } else {
                coerced
            };
        }

        let (valid_from, valid_to) = match valid_period {
            Some((from, to)) => (from.clone(), to.clone()),
            None => (current.valid_from.clone(), current.valid_to.clone()),
        };

        appended.push(RowVersion { row_id: current.row_id.clone(), tx_from: tx, tx_to: TX_INFINITY, valid_from, valid_to, data });
        close_indices.push(idx);
        prev_tx_to.push(current.tx_to);
    }

    let affected = appended.len();
    let op = StagedOp::AppendAndClose { table: schema.name.clone(), versions: appended, close_indices, tx_to: tx, prev_tx_to };
    Ok((op, affected))
}

/// `DELETE FROM t [WHERE ..]`. Closes matching current versions; no new
/// version is appended.
pub fn delete(table: &Table, tx: u64, filter: &[Cond]) -> CResult<(StagedOp, usize)> {
    let schema = &table.schema;
    let mut indices = Vec::new();
    let mut prev_tx_to = Vec::new();

    for (idx, current) in table.current_version_iter() {
        if !super::read::matches_single(schema, current, filter)? {
            continue;
        }
        indices.push(idx);
        prev_tx_to.push(current.tx_to);
    }

    let affected = indices.len();
    let op = StagedOp::Close { table: schema.name.clone(), indices, tx_to: tx, prev_tx_to };
    Ok((op, affected))
}
