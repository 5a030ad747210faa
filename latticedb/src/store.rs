//! Append-only bitemporal row-version log (C4).

use crate::catalog::TableDef;
use crate::error::{CResult, Error};
use crate::value::Value;

/// `tx_to` value meaning "still current".
pub const TX_INFINITY: u64 = u64::MAX;

pub const DEFAULT_VALID_TO: &str = "9999-12-31T23:59:59Z";

#[derive(Debug, Clone, PartialEq)]
pub struct RowVersion {
    pub row_id: String,
    pub tx_from: u64,
    pub tx_to: u64,
    pub valid_from: String,
    pub valid_to: String,
    pub data: Vec<Value>,
}

impl RowVersion {
    pub fn is_current(&self) -> bool {
        self.tx_to == TX_INFINITY
    }

    pub fn visible_at(&self, n: u64) -> bool {
        self.tx_from <= n && n < self.tx_to
    }
}

/// A table's schema plus its append-only version log.
#[derive(Debug, Clone)]
pub struct Table {
    pub schema: TableDef,
    pub versions: Vec<RowVersion>,
}

impl Table {
    pub fn new(schema: TableDef) -> Table {
        Table { schema, versions: Vec::new() }
    }

    /// First current version (`tx_to = +inf`) matching `row_id`, with its
    /// index in the log.
    pub fn current_version(&self, row_id: &str) -> Option<(usize, &RowVersion)> {
        self.versions
            .iter()
            .enumerate()
            .find(|(_, v)| v.is_current() && v.row_id == row_id)
    }

    /// The version visible at transaction `n` for `row_id`, i.e. the one
    /// whose `[tx_from, tx_to)` interval contains `n`.
    pub fn as_of(&self, tx_n: u64, row_id: &str) -> Option<(usize, &RowVersion)> {
        self.versions
            .iter()
            .enumerate()
            .find(|(_, v)| v.row_id == row_id && v.visible_at(tx_n))
    }

    /// All versions visible at `n`, one per `row_id` (the current-at-N
    /// version), in log order.
    pub fn visible_at(&self, n: u64) -> Vec<(usize, &RowVersion)> {
        self.versions.iter().enumerate().filter(|(_, v)| v.visible_at(n)).collect()
    }

    /// All current versions (`tx_to = +inf`), in log order. Used by
    /// UPDATE/DELETE, which only ever act on the live set.
    pub fn current_version_iter(&self) -> impl Iterator<Item = (usize, &RowVersion)> {
        self.versions.iter().enumerate().filter(|(_, v)| v.is_current())
    }

    pub fn append(&mut self, version: RowVersion) -> CResult<usize> {
        if version.tx_from >= version.tx_to {
            return Err(Error::Internal("tx_from must be < tx_to".into()));
        }
        self.versions.push(version);
        Ok(self.versions.len() - 1)
    }

    pub fn close(&mut self, idx: usize, tx_n: u64) -> CResult<u64> {
        let version = self
            .versions
            .get_mut(idx)
            .ok_or_else(|| Error::Internal(format!("no version at index {idx}")))?;
        let prev = version.tx_to;
        version.tx_to = tx_n;
        Ok(prev)
    }

    pub fn reopen(&mut self, idx: usize, tx_to: u64) -> CResult<()> {
        let version = self
            .versions
            .get_mut(idx)
            .ok_or_else(|| Error::Internal(format!("no version at index {idx}")))?;
        version.tx_to = tx_to;
        Ok(())
    }

    pub fn truncate(&mut self, len: usize) {
        self.versions.truncate(len);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::ColumnDef;
    use crate::merge::MergeSpec;
    use crate::value::ValueType;

    fn table() -> Table {
        let schema = TableDef::new(
            "t",
            vec![ColumnDef { name: "ID".into(), ty: ValueType::Text, pk: true, merge: MergeSpec::None }],
        )
        .unwrap();
        Table::new(schema)
    }

    fn version(row_id: &str, tx_from: u64, tx_to: u64) -> RowVersion {
        RowVersion {
            row_id: row_id.into(),
            tx_from,
            tx_to,
            valid_from: "now".into(),
            valid_to: DEFAULT_VALID_TO.into(),
            data: vec![Value::Text(row_id.into())],
        }
    }

    #[test]
    fn only_one_current_version_at_a_time() {
        let mut t = table();
        t.append(version("r1", 1, TX_INFINITY)).unwrap();
        assert!(t.current_version("r1").is_some());
        t.close(0, 2).unwrap();
        t.append(version("r1", 2, TX_INFINITY)).unwrap();
        let current: Vec<_> = t.versions.iter().filter(|v| v.is_current() && v.row_id == "r1").collect();
        assert_eq!(current.len(), 1);
    }

    #[test]
    fn as_of_returns_the_version_live_at_that_tx() {
        let mut t = table();
        t.append(version("r1", 1, 3)).unwrap();
        t.append(version("r1", 3, TX_INFINITY)).unwrap();
        assert_eq!(t.as_of(1, "r1").unwrap().0, 0);
        assert_eq!(t.as_of(3, "r1").unwrap().0, 1);
    }

    #[test]
    fn append_rejects_backwards_interval() {
        let mut t = table();
        assert!(t.append(version("r1", 5, 5)).is_err());
    }
}
