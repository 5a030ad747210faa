//! `latticedb` CLI: an interactive SQL shell over [`latticedb::engine::Database`].
//!
//! ## Getting started
//!
//! ```doc
//! ❯ ./latticedb
//!
//! Welcome to latticedb.
//!
//! latticedb > CREATE TABLE people (id TEXT PRIMARY KEY, name TEXT MERGE lww);
//! table PEOPLE created
//!
//! latticedb > INSERT INTO people (id, name) VALUES ('u1', 'Ada');
//! 1 row(s) inserted
//!
//! latticedb > SELECT name FROM people WHERE id = 'u1';
//! NAME
//! Ada
//! ```

pub mod config;
pub mod linesplit;
pub mod rusty;
pub mod session;
pub mod show;
pub mod trace;
