//! Tagged AST produced by the recursive-descent parser (C6).

use crate::catalog::ColumnDef;
use crate::value::Value;

#[derive(Debug, Clone, PartialEq)]
pub enum Statement {
    CreateTable { name: String, columns: Vec<ColumnDef> },
    DropTable { name: String },
    Insert { table: String, columns: Vec<String>, rows: Vec<Vec<Value>>, on_conflict_merge: bool },
    Update {
        table: String,
        assignments: Vec<(String, Value)>,
        valid_period: Option<(String, String)>,
        filter: Vec<Cond>,
    },
    Delete { table: String, filter: Vec<Cond> },
    Select {
        items: Vec<SelectItem>,
        from: String,
        from_alias: Option<String>,
        join: Option<Join>,
        as_of_tx: Option<u64>,
        filter: Vec<Cond>,
        group_by: Vec<ColumnRef>,
        order_by: Option<(ColumnRef, bool)>,
        limit: Option<usize>,
    },
    SetDpEpsilon(f64),
    SaveDatabase(String),
    LoadDatabase(String),
    Begin,
    Commit,
    Rollback,
    Exit,
    /// An unrecognized or malformed statement; carries the diagnosis as a
    /// message rather than failing to parse at all.
    Invalid(String),
}

#[derive(Debug, Clone, PartialEq)]
pub struct Join {
    pub table: String,
    pub alias: Option<String>,
    pub left: ColumnRef,
    pub right: ColumnRef,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ColumnRef {
    pub table: Option<String>,
    pub column: String,
}

impl ColumnRef {
    pub fn unqualified(column: &str) -> ColumnRef {
        ColumnRef { table: None, column: column.to_string() }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompareOp {
    Eq,
    NotEq,
    Lt,
    Gt,
    Lte,
    Gte,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Cond {
    Compare { col: ColumnRef, op: CompareOp, lit: Value },
    IsNull { col: ColumnRef, negated: bool },
    Distance { col: ColumnRef, vector: Vec<f64>, threshold: f64 },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AggFunc {
    Count,
    Sum,
    Avg,
    Min,
    Max,
}

#[derive(Debug, Clone, PartialEq)]
pub enum SelectItem {
    Star,
    Column(ColumnRef),
    Agg(AggFunc, Option<ColumnRef>),
    DpCount,
}
