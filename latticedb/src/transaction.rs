//! Explicit staged-write enum and the BEGIN/COMMIT/ROLLBACK state machine
//! (C8). Writes are captured as data, not closures: each statement's
//! effect on a single table is one [`StagedOp`], and commit/rollback are
//! pure interpreters over the staged list.

use std::collections::HashMap;

use crate::error::{CResult, Error};
use crate::store::{RowVersion, Table};

#[derive(Debug, Clone)]
pub enum StagedOp {
    Append { table: String, versions: Vec<RowVersion> },
    Close { table: String, indices: Vec<usize>, tx_to: u64, prev_tx_to: Vec<u64> },
    AppendAndClose {
        table: String,
        versions: Vec<RowVersion>,
        close_indices: Vec<usize>,
        tx_to: u64,
        prev_tx_to: Vec<u64>,
    },
}

impl StagedOp {
    pub fn table_name(&self) -> &str {
        match self {
            StagedOp::Append { table, .. }
            | StagedOp::Close { table, .. }
            | StagedOp::AppendAndClose { table, .. } => table,
        }
    }

    pub fn apply(&self, table: &mut Table) -> CResult<()> {
        match self {
            StagedOp::Append { versions, .. } => {
                for v in versions.clone() {
                    table.append(v)?;
                }
                Ok(())
            }
            StagedOp::Close { indices, tx_to, .. } => {
                for &idx in indices {
                    table.close(idx, *tx_to)?;
                }
                Ok(())
            }
            StagedOp::AppendAndClose { versions, close_indices, tx_to, .. } => {
                for &idx in close_indices {
                    table.close(idx, *tx_to)?;
                }
                for v in versions.clone() {
                    table.append(v)?;
                }
                Ok(())
            }
        }
    }

    /// Reverses exactly what `apply` did: pops appended versions and
    /// restores the `tx_to` of whatever this op closed.
    pub fn undo(&self, table: &mut Table) -> CResult<()> {
        match self {
            StagedOp::Append { versions, .. } => {
                let new_len = table.versions.len().saturating_sub(versions.len());
                table.truncate(new_len);
                Ok(())
            }
            StagedOp::Close { indices, prev_tx_to, .. } => {
                for (&idx, &prev) in indices.iter().zip(prev_tx_to) {
                    table.reopen(idx, prev)?;
                }
                Ok(())
            }
            StagedOp::AppendAndClose { versions, close_indices, prev_tx_to, .. } => {
                let new_len = table.versions.len().saturating_sub(versions.len());
                table.truncate(new_len);
                for (&idx, &prev) in close_indices.iter().zip(prev_tx_to) {
                    table.reopen(idx, prev)?;
                }
                Ok(())
            }
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TxState {
    #[default]
    Idle,
    Active,
}

/// The BEGIN/COMMIT/ROLLBACK state machine. Owns the staged-operation
/// list between BEGIN and COMMIT/ROLLBACK.
#[derive(Debug, Default)]
pub struct TransactionController {
    pub state: TxState,
    staged: Vec<StagedOp>,
}

impl TransactionController {
    pub fn is_active(&self) -> bool {
        self.state == TxState::Active
    }

    pub fn begin(&mut self) -> CResult<()> {
        if self.is_active() {
            return Err(Error::Transaction("already in a transaction".into()));
        }
        self.state = TxState::Active;
        self.staged.clear();
        Ok(())
    }

    pub fn stage(&mut self, op: StagedOp) {
        self.staged.push(op);
    }

    pub fn commit(&mut self, tables: &mut HashMap<String, Table>) -> CResult<()> {
        if !self.is_active() {
            return Err(Error::Transaction("no transaction in progress".into()));
        }
        for op in &self.staged {
            let table = tables
                .get_mut(op.table_name())
                .ok_or_else(|| Error::Internal(format!("staged op references missing table {}", op.table_name())))?;
            op.apply(table)?;
        }
        self.state = TxState::Idle;
        self.staged.clear();
        Ok(())
    }

    pub fn rollback(&mut self, tables: &mut HashMap<String, Table>) -> CResult<()> {
        if !self.is_active() {
            return Err(Error::Transaction("no transaction in progress".into()));
        }
        for op in self.staged.iter().rev() {
            let table = tables
                .get_mut(op.table_name())
                .ok_or_else(|| Error::Internal(format!("staged op references missing table {}", op.table_name())))?;
            op.undo(table)?;
        }
        self.state = TxState::Idle;
        self.staged.clear();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::{ColumnDef, TableDef};
    use crate::merge::MergeSpec;
    use crate::store::{DEFAULT_VALID_TO, TX_INFINITY};
    use crate::value::{Value, ValueType};

    fn table() -> Table {
        let schema = TableDef::new(
            "t",
            vec![ColumnDef { name: "ID".into(), ty: ValueType::Text, pk: true, merge: MergeSpec::None }],
        )
        .unwrap();
        Table::new(schema)
    }

    fn version(row_id: &str, tx_from: u64) -> RowVersion {
        RowVersion {
            row_id: row_id.into(),
            tx_from,
            tx_to: TX_INFINITY,
            valid_from: "now".into(),
            valid_to: DEFAULT_VALID_TO.into(),
            data: vec![Value::Text(row_id.into())],
        }
    }

    #[test]
    fn begin_while_active_is_an_error() {
        let mut c = TransactionController::default();
        c.begin().unwrap();
        assert!(c.begin().is_err());
    }

    #[test]
    fn commit_while_idle_is_an_error() {
        let mut tables = HashMap::new();
        assert!(TransactionController::default().commit(&mut tables).is_err());
    }

    #[test]
    fn rollback_restores_pre_begin_state() {
        let mut tables = HashMap::new();
        tables.insert("T".to_string(), table());

        let mut c = TransactionController::default();
        c.begin().unwrap();
        c.stage(StagedOp::Append { table: "T".into(), versions: vec![version("r1", 1)] });
        c.rollback(&mut tables).unwrap();

        assert!(tables["T"].versions.is_empty());
        assert_eq!(c.state, TxState::Idle);
    }

    #[test]
    fn commit_applies_in_order_rollback_undoes_in_reverse() {
        let mut tables = HashMap::new();
        let mut t = table();
        let idx = t.append(version("r1", 1)).unwrap();
        tables.insert("T".to_string(), t);

        let mut c = TransactionController::default();
        c.begin().unwrap();
        c.stage(StagedOp::AppendAndClose {
            table: "T".into(),
            versions: vec![version("r1", 2)],
            close_indices: vec![idx],
            tx_to: 2,
            prev_tx_to: vec![TX_INFINITY],
        });
        c.rollback(&mut tables).unwrap();

        let t = &tables["T"];
        assert_eq!(t.versions.len(), 1);
        assert_eq!(t.versions[0].tx_to, TX_INFINITY);
    }
}
