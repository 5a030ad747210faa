//! The read path: as-of visibility, filtering, inner equi-join,
//! aggregates/GROUP BY, ORDER BY, LIMIT, and `DP_COUNT` (§4.7.1).

use std::cmp::Ordering;
use std::collections::HashMap;

use crate::catalog::{normalize, Catalog, TableDef};
use crate::dp::{noisy_count, DpSettings};
use crate::error::{CResult, Error};
use crate::parser::ast::{AggFunc, Cond, CompareOp, ColumnRef, Join, SelectItem};
use crate::store::{RowVersion, Table, TX_INFINITY};
use crate::value::Value;

/// One (possibly joined) visible row, carrying enough of the schema to
/// resolve qualified and unqualified column references.
struct JoinRow<'a> {
    left_schema: &'a TableDef,
    left_alias: Option<&'a str>,
    left_version: &'a RowVersion,
    right: Option<(&'a TableDef, Option<&'a str>, &'a RowVersion)>,
}

fn names_qualifier(target: &str, schema_name: &str, alias: Option<&str>) -> bool {
    schema_name == target || alias.map(|a| a.eq_ignore_ascii_case(target)).unwrap_or(false)
}

/// Whether a projected column reference names the same column as a GROUP
/// BY entry: same unqualified name, and if both are qualified, the same
/// qualifier too (an unqualified projection matches a qualified GROUP BY
/// column, and vice versa, since there's only one column of that name to
/// mean).
fn column_ref_matches(group_col: &ColumnRef, projected: &ColumnRef) -> bool {
    if !group_col.column.eq_ignore_ascii_case(&projected.column) {
        return false;
    }
    match (&group_col.table, &projected.table) {
        (Some(a), Some(b)) => a.eq_ignore_ascii_case(b),
        _ => true,
    }
}

impl<'a> JoinRow<'a> {
    fn resolve(&self, col: &ColumnRef) -> CResult<Value> {
        if let Some(table) = &col.table {
            let target = normalize(table);
            if names_qualifier(&target, &self.left_schema.name, self.left_alias) {
                return self.column_from(self.left_schema, self.left_version, &col.column);
            }
            if let Some((rs, ralias, rv)) = self.right {
                if names_qualifier(&target, &rs.name, ralias) {
                    return self.column_from(rs, rv, &col.column);
                }
            }
            return Err(Error::Schema(format!("unknown table qualifier {table}")));
        }

        if let Some(idx) = self.left_schema.column_index(&col.column) {
            return Ok(self.left_version.data[idx].clone());
        }
        if let Some((rs, _, rv)) = self.right {
            if let Some(idx) = rs.column_index(&col.column) {
                return Ok(rv.data[idx].clone());
            }
        }
        Err(Error::Schema(format!("unknown column {}", col.column)))
    }

    fn column_from(&self, schema: &'a TableDef, version: &'a RowVersion, name: &str) -> CResult<Value> {
        schema
            .column_index(name)
            .map(|i| version.data[i].clone())
            .ok_or_else(|| Error::Schema(format!("unknown column {name}")))
    }

    /// `*` projection: declared columns in schema order, then the four
    /// bitemporal fields. Only defined against the left (non-join) side,
    /// matching §4.7.1's "all declared columns plus the four bitemporal
    /// fields" wording, which presumes a single table.
    fn project_star(&self) -> Vec<Value> {
        let mut out = self.left_version.data.clone();
        out.push(Value::Int(self.left_version.tx_from as i64));
        out.push(Value::Text(if self.left_version.tx_to == TX_INFINITY {
            "INF".to_string()
        } else {
            self.left_version.tx_to.to_string()
        }));
        out.push(Value::Text(self.left_version.valid_from.clone()));
        out.push(Value::Text(self.left_version.valid_to.clone()));
        out
    }
}

fn star_header(schema: &TableDef) -> Vec<String> {
    let mut header: Vec<String> = schema.columns.iter().map(|c| c.name.clone()).collect();
    header.extend(["TX_FROM".to_string(), "TX_TO".to_string(), "VALID_FROM".to_string(), "VALID_TO".to_string()]);
    header
}

fn eval_cond(cond: &Cond, row: &JoinRow) -> CResult<bool> {
    match cond {
        Cond::Compare { col, op, lit } => {
            let v = row.resolve(col)?;
            let ord = v.compare(lit);
            Ok(match (op, ord) {
                (_, None) => false,
                (CompareOp::Eq, Some(o)) => o == Ordering::Equal,
                (CompareOp::NotEq, Some(o)) => o != Ordering::Equal,
                (CompareOp::Lt, Some(o)) => o == Ordering::Less,
                (CompareOp::Gt, Some(o)) => o == Ordering::Greater,
                (CompareOp::Lte, Some(o)) => o != Ordering::Greater,
                (CompareOp::Gte, Some(o)) => o != Ordering::Less,
            })
        }
        Cond::IsNull { col, negated } => {
            let v = row.resolve(col)?;
            Ok(if *negated { !v.is_null() } else { v.is_null() })
        }
        Cond::Distance { col, vector, threshold } => {
            let v = row.resolve(col)?;
            Ok(v.l2_distance(&Value::Vector(vector.clone())).map(|d| d < *threshold).unwrap_or(false))
        }
    }
}

fn eval_filter(conds: &[Cond], row: &JoinRow) -> CResult<bool> {
    for c in conds {
        if !eval_cond(c, row)? {
            return Ok(false);
        }
    }
    Ok(true)
}

/// Evaluates a conjunctive filter against a single-table row. Shared by
/// UPDATE and DELETE, which never join.
pub fn matches_single(schema: &TableDef, version: &RowVersion, filter: &[Cond]) -> CResult<bool> {
    let row = JoinRow { left_schema: schema, left_alias: None, left_version: version, right: None };
    eval_filter(filter, &row)
}

fn project_item(item: &SelectItem, row: &JoinRow) -> CResult<Value> {
    match item {
        SelectItem::Star => Err(Error::Internal("Star cannot be projected as a single value".into())),
        SelectItem::Column(col) => row.resolve(col),
        SelectItem::Agg(_, _) | SelectItem::DpCount => {
            Err(Error::Internal("aggregate items are not resolved per-row".into()))
        }
    }
}

fn item_header(item: &SelectItem) -> String {
    match item {
        SelectItem::Star => "*".to_string(),
        SelectItem::Column(col) => match &col.table {
            Some(t) => format!("{}.{}", t.to_uppercase(), col.column.to_uppercase()),
            None => col.column.to_uppercase(),
        },
        SelectItem::Agg(AggFunc::Count, _) => "COUNT(*)".to_string(),
        SelectItem::Agg(func, Some(col)) => format!("{:?}({})", func, col.column.to_uppercase()).to_uppercase(),
        SelectItem::Agg(func, None) => format!("{func:?}(*)").to_uppercase(),
        SelectItem::DpCount => "DP_COUNT".to_string(),
    }
}

#[derive(Default)]
struct Accumulator {
    count: u64,
    sum: f64,
    min: Option<Value>,
    max: Option<Value>,
}

impl Accumulator {
    fn add(&mut self, v: &Value) {
        self.count += 1;
        if let Some(n) = v.as_f64() {
            self.sum += n;
        }
        if !v.is_null() {
            if self.min.as_ref().map_or(true, |m| v.compare(m) == Some(Ordering::Less)) {
                self.min = Some(v.clone());
            }
            if self.max.as_ref().map_or(true, |m| v.compare(m) == Some(Ordering::Greater)) {
                self.max = Some(v.clone());
            }
        }
    }
}

#[allow(clippy::too_many_arguments)]
pub fn select(
    catalog: &Catalog,
    tables: &HashMap<String, Table>,
    items: &[SelectItem],
    from: &str,
    from_alias: &Option<String>,
    join: &Option<Join>,
    as_of_tx: Option<u64>,
    filter: &[Cond],
    group_by: &[ColumnRef],
    order_by: &Option<(ColumnRef, bool)>,
    limit: Option<usize>,
) -> CResult<(Vec<String>, Vec<Vec<Value>>)> {
    let left_def = catalog.get(from)?;
    let left_table = tables.get(&left_def.name).ok_or_else(|| Error::Schema(format!("unknown table {from}")))?;
    let n = as_of_tx.unwrap_or(u64::MAX);

    let right_def_table = match join {
        Some(j) => {
            let rd = catalog.get(&j.table)?;
            let rt = tables.get(&rd.name).ok_or_else(|| Error::Schema(format!("unknown table {}", j.table)))?;
            Some((rd, rt))
        }
        None => None,
    };

    let mut rows: Vec<JoinRow> = Vec::new();

    if let (Some(j), Some((right_def, right_table))) = (join, &right_def_table) {
        // Build a hash table on the right table's visible set keyed by
        // the tagged canonical form of the join column, then probe with
        // the left table's visible rows.
        let right_col = right_def
            .column_index(&j.right.column)
            .ok_or_else(|| Error::Schema(format!("unknown column {}", j.right.column)))?;
        let left_col = left_def
            .column_index(&j.left.column)
            .ok_or_else(|| Error::Schema(format!("unknown column {}", j.left.column)))?;

        let mut right_index: HashMap<String, Vec<&RowVersion>> = HashMap::new();
        for (_, v) in right_table.visible_at(n) {
            right_index.entry(v.data[right_col].canonical_key()).or_default().push(v);
        }

        let left_alias = from_alias.as_deref();
        let right_alias = j.alias.as_deref();
        for (_, lv) in left_table.visible_at(n) {
            let key = lv.data[left_col].canonical_key();
            if let Some(matches) = right_index.get(&key) {
                for rv in matches {
                    rows.push(JoinRow {
                        left_schema: left_def,
                        left_alias,
                        left_version: lv,
                        right: Some((right_def, right_alias, rv)),
                    });
                }
            }
        }
    } else {
        let left_alias = from_alias.as_deref();
        for (_, v) in left_table.visible_at(n) {
            rows.push(JoinRow { left_schema: left_def, left_alias, left_version: v, right: None });
        }
    }

    let mut filtered = Vec::new();
    for row in rows {
        if eval_filter(filter, &row)? {
            filtered.push(row);
        }
    }

    if items.iter().any(|i| matches!(i, SelectItem::DpCount)) {
        if items.len() != 1 {
            return Err(Error::Type("DP_COUNT cannot be combined with other items".into()));
        }
        return Err(Error::Internal("DP_COUNT(*) must be routed through select_dp_count".into()));
    }

    let is_aggregating = !group_by.is_empty() || items.iter().any(|i| matches!(i, SelectItem::Agg(_, _)));

    if is_aggregating {
        // Keyed by the tagged canonical form (so cross-type collisions are
        // impossible); each group also keeps the actual group-by values so
        // a projected column matching a GROUP BY column can be re-emitted
        // instead of going to NULL.
        let mut groups: Vec<(Vec<Value>, Vec<Accumulator>)> = Vec::new();
        let mut index: HashMap<Vec<String>, usize> = HashMap::new();

        // A global aggregate (no GROUP BY) always produces exactly one
        // output row, even over zero matching input rows (e.g. `COUNT(*)`
        // on an empty result must report 0, not an empty result set).
        if group_by.is_empty() {
            index.insert(Vec::new(), 0);
            groups.push((Vec::new(), (0..items.len()).map(|_| Accumulator::default()).collect()));
        }

        for row in &filtered {
            let mut key = Vec::with_capacity(group_by.len());
            let mut group_vals = Vec::with_capacity(group_by.len());
            for col in group_by {
                let v = row.resolve(col)?;
                key.push(v.canonical_key());
                group_vals.push(v);
            }
            let group_idx = *index.entry(key).or_insert_with(|| {
                groups.push((group_vals, (0..items.len()).map(|_| Accumulator::default()).collect()));
                groups.len() - 1
            });

            for (i, item) in items.iter().enumerate() {
                match item {
                    SelectItem::Agg(AggFunc::Count, _) => groups[group_idx].1[i].count += 1,
                    SelectItem::Agg(_, Some(col)) => {
                        let v = row.resolve(col)?;
                        groups[group_idx].1[i].add(&v);
                    }
                    _ => {}
                }
            }
        }

        let mut out_rows = Vec::with_capacity(groups.len());
        for (group_vals, accs) in &groups {
            let mut out = Vec::with_capacity(items.len());
            for (i, item) in items.iter().enumerate() {
                let v = match item {
                    SelectItem::Agg(AggFunc::Count, _) => Value::Int(accs[i].count as i64),
                    SelectItem::Agg(AggFunc::Sum, _) => {
                        if accs[i].count == 0 {
                            Value::Null
                        } else {
                            Value::Double(accs[i].sum)
                        }
                    }
                    SelectItem::Agg(AggFunc::Avg, _) => {
                        if accs[i].count == 0 {
                            Value::Null
                        } else {
                            Value::Double(accs[i].sum / accs[i].count as f64)
                        }
                    }
                    SelectItem::Agg(AggFunc::Min, _) => accs[i].min.clone().unwrap_or(Value::Null),
                    SelectItem::Agg(AggFunc::Max, _) => accs[i].max.clone().unwrap_or(Value::Null),
                    // A projected column that names one of the GROUP BY
                    // columns is re-emitted from the group key; anything
                    // else (a non-grouped column, or `*`) has no single
                    // value to reconstruct and emits NULL.
                    SelectItem::Column(col) => group_by
                        .iter()
                        .position(|g| column_ref_matches(g, col))
                        .map(|idx| group_vals[idx].clone())
                        .unwrap_or(Value::Null),
                    SelectItem::Star => Value::Null,
                    SelectItem::DpCount => return Err(Error::Type("DP_COUNT cannot be combined with other items".into())),
                };
                out.push(v);
            }
            out_rows.push(out);
        }

        let header: Vec<String> = items.iter().map(item_header).collect();
        let out_rows = apply_order_and_limit_aggregate(out_rows, order_by, &header, limit);
        return Ok((header, out_rows));
    }

    let header: Vec<String> = if items.len() == 1 && matches!(items[0], SelectItem::Star) {
        star_header(left_def)
    } else {
        items.iter().map(item_header).collect()
    };

    let mut out_rows = Vec::with_capacity(filtered.len());
    for row in &filtered {
        if items.len() == 1 && matches!(items[0], SelectItem::Star) {
            out_rows.push(row.project_star());
        } else {
            let mut out = Vec::with_capacity(items.len());
            for item in items {
                out.push(project_item(item, row)?);
            }
            out_rows.push(out);
        }
    }

    let out_rows = apply_order_and_limit_non_aggregate(out_rows, order_by, &header, limit);
    Ok((header, out_rows))
}

/// Computes `DP_COUNT(*)`. Kept separate from [`select`] because it needs
/// the session epsilon, which `select` has no reason to take for every
/// other query shape.
#[allow(clippy::too_many_arguments)]
pub fn select_dp_count(
    catalog: &Catalog,
    tables: &HashMap<String, Table>,
    from: &str,
    as_of_tx: Option<u64>,
    filter: &[Cond],
    dp: &DpSettings,
) -> CResult<(Vec<String>, Vec<Vec<Value>>)> {
    let left_def = catalog.get(from)?;
    let left_table = tables.get(&left_def.name).ok_or_else(|| Error::Schema(format!("unknown table {from}")))?;
    let n = as_of_tx.unwrap_or(u64::MAX);

    let mut count: u64 = 0;
    for (_, v) in left_table.visible_at(n) {
        let row = JoinRow { left_schema: left_def, left_alias: None, left_version: v, right: None };
        if eval_filter(filter, &row)? {
            count += 1;
        }
    }

    let noisy = noisy_count(count, dp.epsilon);
    Ok((vec!["DP_COUNT".to_string()], vec![vec![Value::Double(noisy)]]))
}

fn apply_order_and_limit_non_aggregate(
    mut rows: Vec<Vec<Value>>,
    order_by: &Option<(ColumnRef, bool)>,
    header: &[String],
    limit: Option<usize>,
) -> Vec<Vec<Value>> {
    if let Some((col, desc)) = order_by {
        if let Some(idx) = header_index(header, col) {
            rows.sort_by(|a, b| {
                let ord = a[idx].display_string().cmp(&b[idx].display_string());
                if *desc {
                    ord.reverse()
                } else {
                    ord
                }
            });
        }
    }
    if let Some(n) = limit {
        rows.truncate(n);
    }
    rows
}

fn apply_order_and_limit_aggregate(
    mut rows: Vec<Vec<Value>>,
    order_by: &Option<(ColumnRef, bool)>,
    header: &[String],
    limit: Option<usize>,
) -> Vec<Vec<Value>> {
    if let Some((col, desc)) = order_by {
        if let Some(idx) = header_index(header, col) {
            rows.sort_by(|a, b| {
                let ord = match (a[idx].as_f64(), b[idx].as_f64()) {
                    (Some(x), Some(y)) => x.partial_cmp(&y).unwrap_or(Ordering::Equal),
                    _ => a[idx].display_string().cmp(&b[idx].display_string()),
                };
                if *desc {
                    ord.reverse()
                } else {
                    ord
                }
            });
        }
    }
    if let Some(n) = limit {
        rows.truncate(n);
    }
    rows
}

fn header_index(header: &[String], col: &ColumnRef) -> Option<usize> {
    let target = col.column.to_uppercase();
    header.iter().position(|h| h.eq_ignore_ascii_case(&target) || h.ends_with(&format!(".{target}")))
}
