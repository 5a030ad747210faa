//! The top-level engine: owns the catalog, tables, transaction counter,
//! DP epsilon, and staged writes, and exposes the single statement-level
//! entry point described in `spec.md` §6.

use std::collections::HashMap;

use crate::catalog::{normalize, Catalog, TableDef};
use crate::dp::DpSettings;
use crate::error::Error;
use crate::executor::{read, write};
use crate::parser::ast::{SelectItem, Statement};
use crate::parser::parse_statements;
use crate::snapshot;
use crate::store::Table;
use crate::transaction::TransactionController;
use crate::value::Value;

/// The result of executing one statement. Never lets an [`Error`] escape
/// as a panic: every fallible path is folded into `ok = false`.
#[derive(Debug, Clone, PartialEq)]
pub struct StatementResult {
    pub ok: bool,
    pub message: String,
    pub header: Option<Vec<String>>,
    pub rows: Vec<Vec<Value>>,
}

impl StatementResult {
    pub fn ok(message: impl Into<String>) -> StatementResult {
        StatementResult { ok: true, message: message.into(), header: None, rows: Vec::new() }
    }

    pub fn rows(header: Vec<String>, rows: Vec<Vec<Value>>) -> StatementResult {
        let message = format!("{} row(s)", rows.len());
        StatementResult { ok: true, message, header: Some(header), rows }
    }

    pub fn err(err: Error) -> StatementResult {
        StatementResult { ok: false, message: err.to_string(), header: None, rows: Vec::new() }
    }
}

/// Owns all mutable engine state for a single session. No locks, no
/// sharing across threads — see `spec.md` §5.
pub struct Database {
    pub catalog: Catalog,
    pub tables: HashMap<String, Table>,
    next_tx: u64,
    pub dp: DpSettings,
    tx_ctrl: TransactionController,
}

impl Default for Database {
    fn default() -> Self {
        Database::new()
    }
}

impl Database {
    pub fn new() -> Database {
        Database {
            catalog: Catalog::new(),
            tables: HashMap::new(),
            next_tx: 1,
            dp: DpSettings::default(),
            tx_ctrl: TransactionController::default(),
        }
    }

    /// Allocates and returns a fresh transaction number. Called by every
    /// write statement, even inside an active transaction: staging
    /// defers application, not numbering (§4.7.2).
    fn begin_tx(&mut self) -> u64 {
        let t = self.next_tx;
        self.next_tx += 1;
        t
    }

    /// Parses and executes every statement in `sql`, in order, returning
    /// one [`StatementResult`] per statement.
    pub fn execute(&mut self, sql: &str) -> Vec<StatementResult> {
        parse_statements(sql).into_iter().map(|stmt| self.execute_one(stmt)).collect()
    }

    fn execute_one(&mut self, stmt: Statement) -> StatementResult {
        match self.dispatch(stmt) {
            Ok(result) => result,
            Err(err) => StatementResult::err(err),
        }
    }

    fn dispatch(&mut self, stmt: Statement) -> Result<StatementResult, Error> {
        match stmt {
            Statement::CreateTable { name, columns } => {
                let def = TableDef::new(&name, columns)?;
                let table_name = def.name.clone();
                self.catalog.create_table(def.clone())?;
                self.tables.insert(table_name, Table::new(def));
                log::info!("table {} created", name.to_uppercase());
                Ok(StatementResult::ok(format!("table {} created", name.to_uppercase())))
            }
            Statement::DropTable { name } => {
                let def = self.catalog.drop_table(&name)?;
                self.tables.remove(&def.name);
                log::info!("table {} dropped", def.name);
                Ok(StatementResult::ok(format!("table {} dropped", def.name)))
            }
            Statement::Insert { table, columns, rows, on_conflict_merge } => {
                let tx = self.begin_tx();
                let schema = self.catalog.get(&table)?;
                let live = self
                    .tables
                    .get(&schema.name)
                    .ok_or_else(|| Error::Internal(format!("catalog/table drift for {}", schema.name)))?;
                let (op, affected) = write::insert(live, tx, &columns, &rows, on_conflict_merge)?;
                self.apply_or_stage(op)?;
                Ok(StatementResult::ok(format!("{affected} row(s) inserted")))
            }
            Statement::Update { table, assignments, valid_period, filter } => {
                let tx = self.begin_tx();
                let schema = self.catalog.get(&table)?;
                let live = self
                    .tables
                    .get(&schema.name)
                    .ok_or_else(|| Error::Internal(format!("catalog/table drift for {}", schema.name)))?;
                let (op, affected) = write::update(live, tx, &assignments, &valid_period, &filter)?;
                self.apply_or_stage(op)?;
                Ok(StatementResult::ok(format!("{affected} row(s) updated")))
            }
            Statement::Delete { table, filter } => {
                let tx = self.begin_tx();
                let schema = self.catalog.get(&table)?;
                let live = self
                    .tables
                    .get(&schema.name)
                    .ok_or_else(|| Error::Internal(format!("catalog/table drift for {}", schema.name)))?;
                let (op, affected) = write::delete(live, tx, &filter)?;
                self.apply_or_stage(op)?;
                Ok(StatementResult::ok(format!("{affected} row(s) deleted")))
            }
            Statement::Select { items, from, from_alias, join, as_of_tx, filter, group_by, order_by, limit } => {
                if items.len() == 1 && matches!(items[0], SelectItem::DpCount) {
                    let (header, rows) =
                        read::select_dp_count(&self.catalog, &self.tables, &from, as_of_tx, &filter, &self.dp)?;
                    return Ok(StatementResult::rows(header, rows));
                }
                let (header, rows) = read::select(
                    &self.catalog,
                    &self.tables,
                    &items,
                    &from,
                    &from_alias,
                    &join,
                    as_of_tx,
                    &filter,
                    &group_by,
                    &order_by,
                    limit,
                )?;
                Ok(StatementResult::rows(header, rows))
            }
            Statement::SetDpEpsilon(epsilon) => {
                self.dp.epsilon = epsilon;
                Ok(StatementResult::ok(format!("DP_EPSILON set to {epsilon}")))
            }
            Statement::SaveDatabase(path) => {
                snapshot::save_to_file(&path, self.next_tx, &self.catalog, &self.tables)?;
                log::info!("database saved to {path}");
                Ok(StatementResult::ok(format!("database saved to {path}")))
            }
            Statement::LoadDatabase(path) => {
                // Load into fresh values and swap only on success, so a
                // structurally invalid snapshot leaves the live database
                // untouched (§4.7.4).
                let (next_tx, catalog, tables) = match snapshot::load_from_file(&path) {
                    Ok(loaded) => loaded,
                    Err(err) => {
                        log::error!("failed to load database from {path}: {err}");
                        return Err(err);
                    }
                };
                self.next_tx = next_tx;
                self.catalog = catalog;
                self.tables = tables;
                self.tx_ctrl = TransactionController::default();
                log::info!("database loaded from {path}");
                Ok(StatementResult::ok(format!("database loaded from {path}")))
            }
            Statement::Begin => {
                self.tx_ctrl.begin()?;
                Ok(StatementResult::ok("transaction started"))
            }
            Statement::Commit => {
                self.tx_ctrl.commit(&mut self.tables)?;
                Ok(StatementResult::ok("transaction committed"))
            }
            Statement::Rollback => {
                self.tx_ctrl.rollback(&mut self.tables)?;
                Ok(StatementResult::ok("transaction rolled back"))
            }
            Statement::Exit => Ok(StatementResult::ok("bye")),
            Statement::Invalid(msg) => Err(Error::Parse(msg)),
        }
    }

    fn apply_or_stage(&mut self, op: crate::transaction::StagedOp) -> Result<(), Error> {
        if self.tx_ctrl.is_active() {
            self.tx_ctrl.stage(op);
            Ok(())
        } else {
            let table = self
                .tables
                .get_mut(op.table_name())
                .ok_or_else(|| Error::Internal(format!("staged op references missing table {}", op.table_name())))?;
            op.apply(table)
        }
    }

    pub fn table_names(&self) -> Vec<String> {
        self.catalog.table_names()
    }

    pub fn is_table(&self, name: &str) -> bool {
        self.catalog.contains(&normalize(name))
    }
}
