//! Recursive-descent parser over the token cursor produced by
//! [`super::token`] (C6).

use crate::catalog::ColumnDef;
use crate::merge::MergeSpec;
use crate::parser::ast::*;
use crate::parser::token::{tokenize_sql, Token, TokenKind};
use crate::value::{Value, ValueType};

/// Tokenizes `sql` and splits it into one token slice per top-level
/// semicolon, parsing each into a [`Statement`]. A blank trailing segment
/// (trailing `;`, or pure whitespace) is dropped. Tokenizer failures and
/// parse failures both surface as `Statement::Invalid`, never as a Rust
/// `Result::Err` — the grammar has no notion of "can't parse at all",
/// only "parsed to something invalid".
pub fn parse_statements(sql: &str) -> Vec<Statement> {
    let tokens = match tokenize_sql(sql) {
        Ok(toks) => toks,
        Err(msg) => return vec![Statement::Invalid(msg)],
    };

    let mut statements = Vec::new();
    let mut current: Vec<Token> = Vec::new();
    for tok in tokens {
        match tok.kind {
            TokenKind::SemiColon => {
                if !current.iter().all(|t| t.kind == TokenKind::EOI) && !current.is_empty() {
                    statements.push(parse_one(&current));
                }
                current = Vec::new();
            }
            TokenKind::EOI => {
                current.push(tok);
            }
            _ => current.push(tok),
        }
    }
    if current.iter().any(|t| t.kind != TokenKind::EOI) {
        statements.push(parse_one(&current));
    }
    statements
}

/// Convenience for callers with exactly one statement (tests, the
/// DP_COUNT §8.S6 style snippets). Returns `Invalid` on empty input.
pub fn parse_statement(sql: &str) -> Statement {
    parse_statements(sql).into_iter().next().unwrap_or_else(|| Statement::Invalid("empty statement".into()))
}

fn parse_one(tokens: &[Token]) -> Statement {
    let mut owned: Vec<Token> = tokens.to_vec();
    if owned.last().map(|t| t.kind) != Some(TokenKind::EOI) {
        owned.push(Token { source: "", slice: "", kind: TokenKind::EOI, span: 0..0 });
    }
    let mut p = Parser { tokens: owned, pos: 0 };
    match p.statement() {
        Ok(stmt) => stmt,
        Err(msg) => Statement::Invalid(msg),
    }
}

type PResult<T> = Result<T, String>;

struct Parser<'a> {
    tokens: Vec<Token<'a>>,
    pos: usize,
}

impl<'a> Parser<'a> {
    fn peek(&self) -> TokenKind {
        self.tokens[self.pos].kind
    }

    fn peek_text(&self) -> &str {
        self.tokens[self.pos].slice
    }

    fn advance(&mut self) -> Token<'a> {
        let tok = self.tokens[self.pos].clone();
        if self.pos + 1 < self.tokens.len() {
            self.pos += 1;
        }
        tok
    }

    fn at(&self, kind: TokenKind) -> bool {
        self.peek() == kind
    }

    fn eat(&mut self, kind: TokenKind) -> bool {
        if self.at(kind) {
            self.advance();
            true
        } else {
            false
        }
    }

    fn expect(&mut self, kind: TokenKind) -> PResult<Token<'a>> {
        if self.at(kind) {
            Ok(self.advance())
        } else {
            Err(format!("expected {kind:?}, found {:?} ({:?})", self.peek(), self.peek_text()))
        }
    }

    fn ident(&mut self) -> PResult<String> {
        if self.at(TokenKind::Ident) {
            Ok(self.advance().slice.to_string())
        } else {
            Err(format!("expected identifier, found {:?}", self.peek()))
        }
    }

    fn statement(&mut self) -> PResult<Statement> {
        let stmt = match self.peek() {
            TokenKind::CREATE => self.create_table()?,
            TokenKind::DROP => self.drop_table()?,
            TokenKind::INSERT => self.insert()?,
            TokenKind::UPDATE => self.update()?,
            TokenKind::DELETE => self.delete()?,
            TokenKind::SELECT => self.select()?,
            TokenKind::SET => self.set_dp_epsilon()?,
            TokenKind::SAVE => self.save_database()?,
            TokenKind::LOAD => self.load_database()?,
            TokenKind::BEGIN => {
                self.advance();
                self.eat(TokenKind::TRANSACTION);
                Statement::Begin
            }
            TokenKind::COMMIT | TokenKind::END => {
                self.advance();
                Statement::Commit
            }
            TokenKind::ROLLBACK => {
                self.advance();
                Statement::Rollback
            }
            TokenKind::EXIT | TokenKind::QUIT => {
                self.advance();
                Statement::Exit
            }
            other => return Err(format!("unrecognized statement starting with {other:?}")),
        };
        Ok(stmt)
    }

    // ---- DDL ----

    fn create_table(&mut self) -> PResult<Statement> {
        self.expect(TokenKind::CREATE)?;
        self.expect(TokenKind::TABLE)?;
        let name = self.ident()?;
        self.expect(TokenKind::LParen)?;
        let mut columns = Vec::new();
        loop {
            columns.push(self.column_def()?);
            if !self.eat(TokenKind::Comma) {
                break;
            }
        }
        self.expect(TokenKind::RParen)?;
        Ok(Statement::CreateTable { name, columns })
    }

    fn column_def(&mut self) -> PResult<ColumnDef> {
        let name = self.ident()?;
        let ty = self.column_type()?;
        let mut pk = false;
        let mut merge = MergeSpec::None;
        loop {
            if self.at(TokenKind::PRIMARY) {
                self.advance();
                self.expect(TokenKind::KEY)?;
                pk = true;
            } else if self.at(TokenKind::MERGE) {
                self.advance();
                merge = self.merge_spec()?;
            } else {
                break;
            }
        }
        Ok(ColumnDef { name: crate::catalog::normalize(&name), ty, pk, merge })
    }

    fn column_type(&mut self) -> PResult<ValueType> {
        match self.peek() {
            TokenKind::INT | TokenKind::INTEGER => {
                self.advance();
                Ok(ValueType::Int)
            }
            TokenKind::DOUBLE | TokenKind::FLOAT => {
                self.advance();
                Ok(ValueType::Double)
            }
            TokenKind::TEXT => {
                self.advance();
                Ok(ValueType::Text)
            }
            TokenKind::SET => {
                self.advance();
                self.expect(TokenKind::Lt)?;
                self.expect(TokenKind::TEXT)?;
                self.expect(TokenKind::Gt)?;
                Ok(ValueType::Set)
            }
            TokenKind::VECTOR => {
                self.advance();
                self.expect(TokenKind::Lt)?;
                let dim = self.expect(TokenKind::LiteralInteger)?.slice.parse::<u32>().map_err(|e| e.to_string())?;
                self.expect(TokenKind::Gt)?;
                Ok(ValueType::Vector(dim))
            }
            other => Err(format!("expected a column type, found {other:?}")),
        }
    }

    fn merge_spec(&mut self) -> PResult<MergeSpec> {
        match self.peek() {
            TokenKind::LWW => {
                self.advance();
                Ok(MergeSpec::Lww)
            }
            TokenKind::GSET => {
                self.advance();
                Ok(MergeSpec::GSet)
            }
            TokenKind::SUM_BOUNDED => {
                self.advance();
                self.expect(TokenKind::LParen)?;
                let min = self.signed_integer()?;
                self.expect(TokenKind::Comma)?;
                let max = self.signed_integer()?;
                self.expect(TokenKind::RParen)?;
                Ok(MergeSpec::SumBounded(min, max))
            }
            other => Err(format!("expected a merge spec, found {other:?}")),
        }
    }

    fn drop_table(&mut self) -> PResult<Statement> {
        self.expect(TokenKind::DROP)?;
        self.expect(TokenKind::TABLE)?;
        let name = self.ident()?;
        Ok(Statement::DropTable { name })
    }

    // ---- DML ----

    fn insert(&mut self) -> PResult<Statement> {
        self.expect(TokenKind::INSERT)?;
        self.expect(TokenKind::INTO)?;
        let table = self.ident()?;
        let mut columns = Vec::new();
        if self.at(TokenKind::LParen) {
            self.advance();
            loop {
                columns.push(self.ident()?);
                if !self.eat(TokenKind::Comma) {
                    break;
                }
            }
            self.expect(TokenKind::RParen)?;
        }
        self.expect(TokenKind::VALUES)?;
        let mut rows = Vec::new();
        loop {
            self.expect(TokenKind::LParen)?;
            let mut row = Vec::new();
            loop {
                row.push(self.literal()?);
                if !self.eat(TokenKind::Comma) {
                    break;
                }
            }
            self.expect(TokenKind::RParen)?;
            rows.push(row);
            if !self.eat(TokenKind::Comma) {
                break;
            }
        }
        let on_conflict_merge = if self.at(TokenKind::ON) {
            self.advance();
            self.expect(TokenKind::CONFLICT)?;
            self.expect(TokenKind::MERGE)?;
            true
        } else {
            false
        };
        Ok(Statement::Insert { table, columns, rows, on_conflict_merge })
    }

    fn update(&mut self) -> PResult<Statement> {
        self.expect(TokenKind::UPDATE)?;
        let table = self.ident()?;
        self.expect(TokenKind::SET)?;
        let mut assignments = Vec::new();
        loop {
            let col = self.ident()?;
            self.expect(TokenKind::Eq)?;
            let lit = self.literal()?;
            assignments.push((col, lit));
            if !self.eat(TokenKind::Comma) {
                break;
            }
        }
        let valid_period = if self.at(TokenKind::VALID) {
            self.advance();
            self.expect(TokenKind::PERIOD)?;
            self.expect(TokenKind::LBracket)?;
            let from = self.quoted_string()?;
            self.expect(TokenKind::Comma)?;
            let to = self.quoted_string()?;
            self.expect(TokenKind::RParen).or_else(|_| self.expect(TokenKind::RBracket))?;
            Some((from, to))
        } else {
            None
        };
        let filter = if self.eat(TokenKind::WHERE) { self.conditions()? } else { Vec::new() };
        Ok(Statement::Update { table, assignments, valid_period, filter })
    }

    fn delete(&mut self) -> PResult<Statement> {
        self.expect(TokenKind::DELETE)?;
        self.expect(TokenKind::FROM)?;
        let table = self.ident()?;
        let filter = if self.eat(TokenKind::WHERE) { self.conditions()? } else { Vec::new() };
        Ok(Statement::Delete { table, filter })
    }

    fn select(&mut self) -> PResult<Statement> {
        self.expect(TokenKind::SELECT)?;
        let items = self.select_items()?;
        self.expect(TokenKind::FROM)?;
        let from = self.ident()?;
        let from_alias = if self.at(TokenKind::Ident) { Some(self.ident()?) } else { None };

        let join = if self.at(TokenKind::JOIN) {
            self.advance();
            let table = self.ident()?;
            let alias = if self.at(TokenKind::Ident) { Some(self.ident()?) } else { None };
            self.expect(TokenKind::ON)?;
            let left = self.column_ref()?;
            self.expect(TokenKind::Eq)?;
            let right = self.column_ref()?;
            Some(Join { table, alias, left, right })
        } else {
            None
        };

        let as_of_tx = if self.at(TokenKind::FOR) {
            self.advance();
            self.expect(TokenKind::SYSTEM_TIME)?;
            self.expect(TokenKind::AS)?;
            self.expect(TokenKind::OF)?;
            self.expect(TokenKind::TX)?;
            Some(self.expect(TokenKind::LiteralInteger)?.slice.parse::<u64>().map_err(|e| e.to_string())?)
        } else {
            None
        };

        let filter = if self.eat(TokenKind::WHERE) { self.conditions()? } else { Vec::new() };

        let group_by = if self.at(TokenKind::GROUP) {
            self.advance();
            self.expect(TokenKind::BY)?;
            let mut cols = Vec::new();
            loop {
                cols.push(self.column_ref()?);
                if !self.eat(TokenKind::Comma) {
                    break;
                }
            }
            cols
        } else {
            Vec::new()
        };

        let order_by = if self.at(TokenKind::ORDER) {
            self.advance();
            self.expect(TokenKind::BY)?;
            let col = self.column_ref()?;
            let desc = if self.at(TokenKind::DESC) {
                self.advance();
                true
            } else {
                self.eat(TokenKind::ASC);
                false
            };
            Some((col, desc))
        } else {
            None
        };

        let limit = if self.at(TokenKind::LIMIT) {
            self.advance();
            Some(self.expect(TokenKind::LiteralInteger)?.slice.parse::<usize>().map_err(|e| e.to_string())?)
        } else {
            None
        };

        Ok(Statement::Select { items, from, from_alias, join, as_of_tx, filter, group_by, order_by, limit })
    }

    fn select_items(&mut self) -> PResult<Vec<SelectItem>> {
        if self.at(TokenKind::Star) {
            self.advance();
            return Ok(vec![SelectItem::Star]);
        }
        let mut items = Vec::new();
        loop {
            items.push(self.select_item()?);
            if !self.eat(TokenKind::Comma) {
                break;
            }
        }
        Ok(items)
    }

    fn select_item(&mut self) -> PResult<SelectItem> {
        match self.peek() {
            TokenKind::COUNT => {
                self.advance();
                self.expect(TokenKind::LParen)?;
                self.expect(TokenKind::Star)?;
                self.expect(TokenKind::RParen)?;
                Ok(SelectItem::Agg(AggFunc::Count, None))
            }
            TokenKind::DP_COUNT => {
                self.advance();
                self.expect(TokenKind::LParen)?;
                self.expect(TokenKind::Star)?;
                self.expect(TokenKind::RParen)?;
                Ok(SelectItem::DpCount)
            }
            TokenKind::SUM | TokenKind::AVG | TokenKind::MIN | TokenKind::MAX => {
                let func = match self.advance().kind {
                    TokenKind::SUM => AggFunc::Sum,
                    TokenKind::AVG => AggFunc::Avg,
                    TokenKind::MIN => AggFunc::Min,
                    _ => AggFunc::Max,
                };
                self.expect(TokenKind::LParen)?;
                let col = self.column_ref()?;
                self.expect(TokenKind::RParen)?;
                Ok(SelectItem::Agg(func, Some(col)))
            }
            _ => Ok(SelectItem::Column(self.column_ref()?)),
        }
    }

    // ---- shared fragments ----

    fn column_ref(&mut self) -> PResult<ColumnRef> {
        let first = self.ident()?;
        if self.eat(TokenKind::Period) {
            let column = self.ident()?;
            Ok(ColumnRef { table: Some(first), column })
        } else {
            Ok(ColumnRef::unqualified(&first))
        }
    }

    fn conditions(&mut self) -> PResult<Vec<Cond>> {
        let mut conds = Vec::new();
        loop {
            conds.push(self.condition()?);
            if !self.eat(TokenKind::AND) {
                break;
            }
        }
        Ok(conds)
    }

    fn condition(&mut self) -> PResult<Cond> {
        if self.at(TokenKind::DISTANCE) {
            self.advance();
            self.expect(TokenKind::LParen)?;
            let col = self.column_ref()?;
            self.expect(TokenKind::Comma)?;
            let vector = self.vector_literal()?;
            self.expect(TokenKind::RParen)?;
            self.expect(TokenKind::Lt)?;
            let threshold = self.number()?;
            return Ok(Cond::Distance { col, vector, threshold });
        }

        let col = self.column_ref()?;
        if self.at(TokenKind::IS) {
            self.advance();
            let negated = self.eat(TokenKind::NOT);
            self.expect(TokenKind::NULL)?;
            return Ok(Cond::IsNull { col, negated });
        }

        let op = match self.peek() {
            TokenKind::Eq => CompareOp::Eq,
            TokenKind::NotEq => CompareOp::NotEq,
            TokenKind::Lt => CompareOp::Lt,
            TokenKind::Gt => CompareOp::Gt,
            TokenKind::Lte => CompareOp::Lte,
            TokenKind::Gte => CompareOp::Gte,
            other => return Err(format!("expected a comparison operator, found {other:?}")),
        };
        self.advance();
        let lit = self.literal()?;
        Ok(Cond::Compare { col, op, lit })
    }

    fn signed_integer(&mut self) -> PResult<i64> {
        let negative = self.eat(TokenKind::Minus);
        let tok = self.expect(TokenKind::LiteralInteger)?;
        let n: i64 = tok.slice.parse().map_err(|e: std::num::ParseIntError| e.to_string())?;
        Ok(if negative { -n } else { n })
    }

    fn number(&mut self) -> PResult<f64> {
        let negative = self.eat(TokenKind::Minus);
        let n = match self.peek() {
            TokenKind::LiteralInteger | TokenKind::LiteralFloat => {
                self.advance().slice.parse::<f64>().map_err(|e| e.to_string())?
            }
            other => return Err(format!("expected a number, found {other:?}")),
        };
        Ok(if negative { -n } else { n })
    }

    fn quoted_string(&mut self) -> PResult<String> {
        let tok = self.expect(TokenKind::QuotedString)?;
        Ok(unquote(tok.slice))
    }

    fn vector_literal(&mut self) -> PResult<Vec<f64>> {
        self.expect(TokenKind::LBracket)?;
        let mut items = Vec::new();
        if !self.at(TokenKind::RBracket) {
            loop {
                items.push(self.number()?);
                if !self.eat(TokenKind::Comma) {
                    break;
                }
            }
        }
        self.expect(TokenKind::RBracket)?;
        Ok(items)
    }

    fn set_literal(&mut self) -> PResult<Vec<String>> {
        self.expect(TokenKind::LBrace)?;
        let mut items = Vec::new();
        if !self.at(TokenKind::RBrace) {
            loop {
                let item = match self.peek() {
                    TokenKind::QuotedString => unquote(self.advance().slice),
                    TokenKind::Ident | TokenKind::LiteralInteger | TokenKind::LiteralFloat => {
                        self.advance().slice.to_string()
                    }
                    other => return Err(format!("expected a set element, found {other:?}")),
                };
                items.push(item);
                if !self.eat(TokenKind::Comma) {
                    break;
                }
            }
        }
        self.expect(TokenKind::RBrace)?;
        Ok(items)
    }

    fn literal(&mut self) -> PResult<Value> {
        match self.peek() {
            TokenKind::NULL => {
                self.advance();
                Ok(Value::Null)
            }
            TokenKind::Minus => {
                self.advance();
                match self.peek() {
                    TokenKind::LiteralInteger => {
                        Ok(Value::Int(-self.advance().slice.parse::<i64>().map_err(|e| e.to_string())?))
                    }
                    TokenKind::LiteralFloat => {
                        Ok(Value::Double(-self.advance().slice.parse::<f64>().map_err(|e| e.to_string())?))
                    }
                    other => Err(format!("expected a number after '-', found {other:?}")),
                }
            }
            TokenKind::LiteralInteger => Ok(Value::Int(self.advance().slice.parse().map_err(|e: std::num::ParseIntError| e.to_string())?)),
            TokenKind::LiteralFloat => Ok(Value::Double(self.advance().slice.parse().map_err(|e: std::num::ParseFloatError| e.to_string())?)),
            TokenKind::QuotedString => Ok(Value::Text(unquote(self.advance().slice))),
            TokenKind::LBrace => Ok(Value::set_of(self.set_literal()?)),
            TokenKind::LBracket => Ok(Value::Vector(self.vector_literal()?)),
            other => Err(format!("expected a literal value, found {other:?}")),
        }
    }

    fn set_dp_epsilon(&mut self) -> PResult<Statement> {
        self.expect(TokenKind::SET)?;
        self.expect(TokenKind::DP_EPSILON)?;
        self.expect(TokenKind::Eq)?;
        let value = self.number()?;
        Ok(Statement::SetDpEpsilon(value))
    }

    fn save_database(&mut self) -> PResult<Statement> {
        self.expect(TokenKind::SAVE)?;
        self.expect(TokenKind::DATABASE)?;
        Ok(Statement::SaveDatabase(self.quoted_string()?))
    }

    fn load_database(&mut self) -> PResult<Statement> {
        self.expect(TokenKind::LOAD)?;
        self.expect(TokenKind::DATABASE)?;
        Ok(Statement::LoadDatabase(self.quoted_string()?))
    }
}

/// Strips the surrounding quote character and resolves backslash escapes
/// (`\'`, `\"`, `\\`, and any other `\x` collapsing to `x`).
fn unquote(raw: &str) -> String {
    let inner = &raw[1..raw.len() - 1];
    let mut out = String::with_capacity(inner.len());
    let mut chars = inner.chars();
    while let Some(c) = chars.next() {
        if c == '\\' {
            if let Some(next) = chars.next() {
                out.push(next);
            }
        } else {
            out.push(c);
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_create_table_with_merge_specs() {
        let stmt = parse_statement(
            "CREATE TABLE people (id TEXT PRIMARY KEY, name TEXT MERGE lww, tags SET<TEXT> MERGE gset, credits INT MERGE sum_bounded(0, 1000000))",
        );
        match stmt {
            Statement::CreateTable { name, columns } => {
                assert_eq!(name, "people");
                assert_eq!(columns.len(), 4);
                assert!(columns[0].pk);
                assert_eq!(columns[3].merge, MergeSpec::SumBounded(0, 1000000));
            }
            other => panic!("expected CreateTable, got {other:?}"),
        }
    }

    #[test]
    fn parses_insert_with_set_and_on_conflict_merge() {
        let stmt = parse_statement(
            "INSERT INTO people (id,name,tags,credits) VALUES ('u1',15,{'leader'},'Ada Lovelace') ON CONFLICT MERGE",
        );
        match stmt {
            Statement::Insert { table, rows, on_conflict_merge, .. } => {
                assert_eq!(table, "people");
                assert!(on_conflict_merge);
                assert_eq!(rows[0][2], Value::Set(vec!["leader".into()]));
            }
            other => panic!("expected Insert, got {other:?}"),
        }
    }

    #[test]
    fn parses_join_and_group_by() {
        let stmt = parse_statement(
            "SELECT d.dept_name, COUNT(*), SUM(e.salary) FROM employees e JOIN departments d ON e.dept_id=d.dept_id GROUP BY d.dept_name ORDER BY dept_name",
        );
        match stmt {
            Statement::Select { items, join, group_by, order_by, .. } => {
                assert_eq!(items.len(), 3);
                assert!(join.is_some());
                assert_eq!(group_by, vec![ColumnRef { table: Some("d".into()), column: "dept_name".into() }]);
                assert!(order_by.is_some());
            }
            other => panic!("expected Select, got {other:?}"),
        }
    }

    #[test]
    fn parses_distance_predicate() {
        let stmt = parse_statement("SELECT id FROM v WHERE DISTANCE(e,[0.1,0,0,0]) < 0.5");
        match stmt {
            Statement::Select { filter, .. } => {
                assert_eq!(filter.len(), 1);
                assert!(matches!(filter[0], Cond::Distance { threshold, .. } if threshold == 0.5));
            }
            other => panic!("expected Select, got {other:?}"),
        }
    }

    #[test]
    fn unrecognized_statement_is_invalid_not_a_panic() {
        assert!(matches!(parse_statement("FROBNICATE everything"), Statement::Invalid(_)));
    }

    #[test]
    fn splits_multiple_statements_on_semicolons() {
        let stmts = parse_statements("BEGIN; COMMIT;");
        assert_eq!(stmts, vec![Statement::Begin, Statement::Commit]);
    }

    #[test]
    fn as_of_tx_clause_parses() {
        let stmt = parse_statement("SELECT name FROM people FOR SYSTEM_TIME AS OF TX 1 WHERE id='u1'");
        match stmt {
            Statement::Select { as_of_tx, .. } => assert_eq!(as_of_tx, Some(1)),
            other => panic!("expected Select, got {other:?}"),
        }
    }
}
