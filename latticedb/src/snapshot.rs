//! Deterministic textual snapshot codec (C5). The magic string
//! `FORGEDB_SNAPSHOT_V1` is preserved verbatim from the source system for
//! load compatibility even though the product is named LatticeDB.

use std::collections::HashMap;
use std::fmt::Write as _;
use std::path::Path;

use crate::catalog::{Catalog, ColumnDef, TableDef};
use crate::error::{CResult, Error};
use crate::merge::MergeSpec;
use crate::store::{RowVersion, Table, TX_INFINITY};
use crate::value::{Value, ValueType};

pub const MAGIC: &str = "FORGEDB_SNAPSHOT_V1";

pub fn save_to_file(path: &str, next_tx: u64, catalog: &Catalog, tables: &HashMap<String, Table>) -> CResult<()> {
    let text = encode(next_tx, catalog, tables);
    std::fs::write(Path::new(path), text)?;
    Ok(())
}

pub fn load_from_file(path: &str) -> CResult<(u64, Catalog, HashMap<String, Table>)> {
    let text = std::fs::read_to_string(Path::new(path))?;
    decode(&text)
}

pub fn encode(next_tx: u64, catalog: &Catalog, tables: &HashMap<String, Table>) -> String {
    let mut out = String::new();
    writeln!(out, "{MAGIC}").unwrap();
    writeln!(out, "{next_tx}").unwrap();

    let names = catalog.table_names();
    writeln!(out, "{}", names.len()).unwrap();
    for name in names {
        let def = catalog.get(&name).expect("table listed in catalog must resolve");
        let table = tables.get(&name).expect("every catalog table has a Table entry");
        encode_table(&mut out, def, table);
    }
    out
}

fn encode_table(out: &mut String, def: &TableDef, table: &Table) {
    writeln!(out, "{}", escape(&def.name)).unwrap();
    writeln!(out, "{}", def.columns.len()).unwrap();
    for col in &def.columns {
        let (min, max) = match col.merge {
            MergeSpec::SumBounded(min, max) => (min, max),
            _ => (0, 0),
        };
        let dim = match col.ty {
            ValueType::Vector(d) => d,
            _ => 0,
        };
        writeln!(
            out,
            "{}|{}|{}|{}|{}|{}|{}",
            escape(&col.name),
            type_code(col.ty),
            merge_code(&col.merge),
            min,
            max,
            dim,
            if col.pk { 1 } else { 0 },
        )
        .unwrap();
    }

    writeln!(out, "{}", table.versions.len()).unwrap();
    for v in &table.versions {
        let tx_to = if v.tx_to == TX_INFINITY { "INF".to_string() } else { v.tx_to.to_string() };
        writeln!(
            out,
            "{}|{}|{}|{}|{}",
            escape(&v.row_id),
            v.tx_from,
            tx_to,
            escape(&v.valid_from),
            escape(&v.valid_to),
        )
        .unwrap();
        writeln!(out, "{}", v.data.len()).unwrap();
        for val in &v.data {
            writeln!(out, "{}", encode_value(val)).unwrap();
        }
    }
}

fn type_code(ty: ValueType) -> &'static str {
    match ty {
        ValueType::Int => "INT",
        ValueType::Double => "DOUBLE",
        ValueType::Text => "TEXT",
        ValueType::Set => "SET",
        ValueType::Vector(_) => "VEC",
    }
}

fn merge_code(spec: &MergeSpec) -> &'static str {
    match spec {
        MergeSpec::None => "NONE",
        MergeSpec::Lww => "LWW",
        MergeSpec::SumBounded(_, _) => "SUM_BOUNDED",
        MergeSpec::GSet => "GSET",
    }
}

fn encode_value(v: &Value) -> String {
    match v {
        Value::Null => "N".to_string(),
        Value::Int(i) => format!("I {i}"),
        Value::Double(d) => format!("F {d}"),
        Value::Text(s) => format!("S {}", escape(s)),
        Value::Set(items) => {
            format!("G {}", items.iter().map(|i| escape(i)).collect::<Vec<_>>().join(","))
        }
        Value::Vector(items) => {
            format!("V {}", items.iter().map(|f| f.to_string()).collect::<Vec<_>>().join(","))
        }
    }
}

/// Backslash escapes backslash, pipe, and newline, per `spec.md` §4.5.
/// Also escapes commas: `G`-tagged values join their elements with `,`
/// (§4.5's "comma-joined, backslash-escaped"), so an element containing a
/// literal comma must be escaped or it would be split as two elements.
fn escape(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '\\' => out.push_str("\\\\"),
            '|' => out.push_str("\\|"),
            '\n' => out.push_str("\\n"),
            ',' => out.push_str("\\,"),
            other => out.push(other),
        }
    }
    out
}

fn unescape(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    let mut chars = s.chars();
    while let Some(c) = chars.next() {
        if c == '\\' {
            match chars.next() {
                Some('n') => out.push('\n'),
                Some(other) => out.push(other),
                None => out.push('\\'),
            }
        } else {
            out.push(c);
        }
    }
    out
}

/// Splits a pipe-delimited line, honoring backslash escapes so an
/// escaped `|` does not end a field.
fn split_fields(line: &str) -> Vec<String> {
    let mut fields = Vec::new();
    let mut current = String::new();
    let mut escaping = false;
    for c in line.chars() {
        if escaping {
            current.push('\\');
            current.push(c);
            escaping = false;
        } else if c == '\\' {
            escaping = true;
        } else if c == '|' {
            fields.push(unescape(&current));
            current.clear();
        } else {
            current.push(c);
        }
    }
    if escaping {
        current.push('\\');
    }
    fields.push(unescape(&current));
    fields
}

struct LineReader<'a> {
    lines: std::str::Lines<'a>,
}

impl<'a> LineReader<'a> {
    fn next(&mut self) -> CResult<&'a str> {
        self.lines.next().ok_or_else(|| Error::Io("snapshot truncated".into()))
    }

    fn next_usize(&mut self) -> CResult<usize> {
        self.next()?.trim().parse().map_err(|_| Error::Io("expected an integer".into()))
    }

    fn next_u64(&mut self) -> CResult<u64> {
        self.next()?.trim().parse().map_err(|_| Error::Io("expected an integer".into()))
    }
}

pub fn decode(text: &str) -> CResult<(u64, Catalog, HashMap<String, Table>)> {
    let mut reader = LineReader { lines: text.lines() };

    let magic = reader.next()?;
    if magic.trim_end() != MAGIC {
        return Err(Error::Io(format!("bad snapshot magic: {magic:?}")));
    }

    let next_tx = reader.next_u64()?;
    let table_count = reader.next_usize()?;

    let mut catalog = Catalog::new();
    let mut tables = HashMap::new();
    for _ in 0..table_count {
        let (def, table) = decode_table(&mut reader)?;
        let name = def.name.clone();
        catalog.create_table(def)?;
        tables.insert(name, table);
    }

    Ok((next_tx, catalog, tables))
}

fn decode_table(reader: &mut LineReader) -> CResult<(TableDef, Table)> {
    let name = unescape(reader.next()?);
    let col_count = reader.next_usize()?;
    let mut columns = Vec::with_capacity(col_count);
    for _ in 0..col_count {
        let line = reader.next()?;
        let fields = split_fields(line);
        if fields.len() != 7 {
            return Err(Error::Io(format!("malformed column line: {line:?}")));
        }
        let dim: u32 = fields[5].parse().map_err(|_| Error::Io("bad vector dimension".into()))?;
        let ty = match fields[1].as_str() {
            "INT" => ValueType::Int,
            "DOUBLE" => ValueType::Double,
            "TEXT" => ValueType::Text,
            "SET" => ValueType::Set,
            "VEC" => ValueType::Vector(dim),
            other => return Err(Error::Io(format!("unknown column type code {other:?}"))),
        };
        let min: i64 = fields[3].parse().map_err(|_| Error::Io("bad merge min".into()))?;
        let max: i64 = fields[4].parse().map_err(|_| Error::Io("bad merge max".into()))?;
        let merge = match fields[2].as_str() {
            "NONE" => MergeSpec::None,
            "LWW" => MergeSpec::Lww,
            "SUM_BOUNDED" => MergeSpec::SumBounded(min, max),
            "GSET" => MergeSpec::GSet,
            other => return Err(Error::Io(format!("unknown merge code {other:?}"))),
        };
        let pk = fields[6] == "1";
        columns.push(ColumnDef { name: fields[0].clone(), ty, pk, merge });
    }
    let def = TableDef::new(&name, columns)?;

    let version_count = reader.next_usize()?;
    let mut table = Table::new(def.clone());
    for _ in 0..version_count {
        let line = reader.next()?;
        let fields = split_fields(line);
        if fields.len() != 5 {
            return Err(Error::Io(format!("malformed version line: {line:?}")));
        }
        let tx_from: u64 = fields[1].parse().map_err(|_| Error::Io("bad tx_from".into()))?;
        let tx_to = if fields[2] == "INF" {
            TX_INFINITY
        } else {
            fields[2].parse().map_err(|_| Error::Io("bad tx_to".into()))?
        };
        let data_len = reader.next_usize()?;
        let mut data = Vec::with_capacity(data_len);
        for _ in 0..data_len {
            data.push(decode_value(reader.next()?)?);
        }
        table
            .append(RowVersion {
                row_id: fields[0].clone(),
                tx_from,
                tx_to,
                valid_from: fields[3].clone(),
                valid_to: fields[4].clone(),
                data,
            })
            .map_err(|_| Error::Io("non-monotonic tx interval in snapshot".into()))?;
    }

    Ok((def, table))
}

fn decode_value(line: &str) -> CResult<Value> {
    let (tag, rest) = match line.split_once(' ') {
        Some((t, r)) => (t, r),
        None => (line, ""),
    };
    match tag {
        "N" => Ok(Value::Null),
        "I" => rest.parse().map(Value::Int).map_err(|_| Error::Io("bad int value".into())),
        "F" => rest.parse().map(Value::Double).map_err(|_| Error::Io("bad float value".into())),
        "S" => Ok(Value::Text(unescape(rest))),
        "G" => {
            if rest.is_empty() {
                Ok(Value::Set(Vec::new()))
            } else {
                Ok(Value::set_of(rest.split(',').map(unescape).collect()))
            }
        }
        "V" => {
            if rest.is_empty() {
                Ok(Value::Vector(Vec::new()))
            } else {
                let nums: CResult<Vec<f64>> =
                    rest.split(',').map(|s| s.parse().map_err(|_| Error::Io("bad vector element".into()))).collect();
                Ok(Value::Vector(nums?))
            }
        }
        other => Err(Error::Io(format!("unknown value tag {other:?}"))),
    }
}
