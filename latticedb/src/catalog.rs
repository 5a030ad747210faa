//! Table definitions and case-insensitive name resolution (C3).

use crate::error::{CResult, Error};
use crate::merge::MergeSpec;
use crate::value::ValueType;

#[derive(Debug, Clone, PartialEq)]
pub struct ColumnDef {
    /// Stored uppercased; lookups normalize before comparing.
    pub name: String,
    pub ty: ValueType,
    pub pk: bool,
    pub merge: MergeSpec,
}

#[derive(Debug, Clone)]
pub struct TableDef {
    /// Stored uppercased.
    pub name: String,
    pub columns: Vec<ColumnDef>,
    pub pk_index: Option<usize>,
    pub mergeable: bool,
}

impl TableDef {
    pub fn new(name: &str, columns: Vec<ColumnDef>) -> CResult<TableDef> {
        let pk_index = columns.iter().position(|c| c.pk);
        if let Some(idx) = pk_index {
            match columns[idx].ty {
                ValueType::Int | ValueType::Text => {}
                other => {
                    return Err(Error::Schema(format!(
                        "primary key column {} must be INT or TEXT, found {other}",
                        columns[idx].name
                    )))
                }
            }
        }
        Ok(TableDef { name: name.to_uppercase(), columns, pk_index, mergeable: true })
    }

    pub fn column_index(&self, name: &str) -> Option<usize> {
        let target = normalize(name);
        self.columns.iter().position(|c| c.name == target)
    }

    pub fn column(&self, name: &str) -> Option<&ColumnDef> {
        self.column_index(name).map(|i| &self.columns[i])
    }

    pub fn pk_column(&self) -> Option<&ColumnDef> {
        self.pk_index.map(|i| &self.columns[i])
    }
}

pub fn normalize(name: &str) -> String {
    name.to_uppercase()
}

/// Owns the set of table definitions, keyed by their uppercased name.
#[derive(Debug, Clone, Default)]
pub struct Catalog {
    tables: std::collections::HashMap<String, TableDef>,
}

impl Catalog {
    pub fn new() -> Catalog {
        Catalog::default()
    }

    pub fn create_table(&mut self, def: TableDef) -> CResult<()> {
        if self.tables.contains_key(&def.name) {
            return Err(Error::Schema(format!("table {} already exists", def.name)));
        }
        self.tables.insert(def.name.clone(), def);
        Ok(())
    }

    pub fn drop_table(&mut self, name: &str) -> CResult<TableDef> {
        self.tables
            .remove(&normalize(name))
            .ok_or_else(|| Error::Schema(format!("unknown table {name}")))
    }

    pub fn get(&self, name: &str) -> CResult<&TableDef> {
        self.tables
            .get(&normalize(name))
            .ok_or_else(|| Error::Schema(format!("unknown table {name}")))
    }

    pub fn get_mut(&mut self, name: &str) -> CResult<&mut TableDef> {
        self.tables
            .get_mut(&normalize(name))
            .ok_or_else(|| Error::Schema(format!("unknown table {name}")))
    }

    pub fn contains(&self, name: &str) -> bool {
        self.tables.contains_key(&normalize(name))
    }

    pub fn table_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.tables.keys().cloned().collect();
        names.sort();
        names
    }
}
