//! `latticedb` is an embeddable bitemporal, CRDT-mergeable relational
//! store: every row carries a transaction-time interval and a valid-time
//! interval, conflicting writes resolve through a per-column merge
//! function instead of last-writer-wins-by-default, and a small SQL
//! dialect drives the whole thing end to end (`CREATE TABLE` .. `MERGE`,
//! `INSERT .. ON CONFLICT MERGE`, `SELECT .. FOR SYSTEM_TIME AS OF TX`,
//! `SELECT DP_COUNT(*)`).
//!
//! ## Getting started
//!
//! ```rust
//! use latticedb::engine::Database;
//!
//! let mut db = Database::new();
//! for result in db.execute(
//!     "CREATE TABLE people (id TEXT PRIMARY KEY, name TEXT MERGE lww, credits INT MERGE sum_bounded(0, 1000000));
//!      INSERT INTO people (id, name, credits) VALUES ('u1', 'Ada', 10);
//!      SELECT name, credits FROM people WHERE id = 'u1';",
//! ) {
//!     println!("{}", result.message);
//! }
//! ```
//!
//! `storage` is a separate, byte-oriented key/value engine trait that
//! predates the table model above; it is kept as a standalone scan/point-op
//! abstraction and nothing in the SQL executor reaches it.

pub mod catalog;
pub mod dp;
pub mod engine;
pub mod error;
pub mod executor;
pub mod merge;
pub mod parser;
pub mod snapshot;
pub mod storage;
pub mod store;
pub mod transaction;
pub mod value;
