use std::io::BufRead;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Instant;

use anyhow::{anyhow, Result};
use rustyline::config::Builder;
use rustyline::error::ReadlineError;
use rustyline::history::DefaultHistory;
use rustyline::{CompletionType, Editor};

use latticedb::engine::{Database, StatementResult};

use crate::config::{ConfigLoad, DEFAULT_PROMPT};
use crate::linesplit::{TokenKind, Tokenizer};
use crate::rusty::CliHelper;
use crate::show::Show;

/// Owns the live database and the REPL/batch-mode bookkeeping around it:
/// multi-line statement buffering, history, and per-statement timing.
pub struct Session {
    is_repl: bool,
    running: Arc<AtomicBool>,
    db: Database,

    settings: ConfigLoad,
    query: String,
    in_comment_block: bool,
}

impl Session {
    pub fn try_new(settings: ConfigLoad, is_repl: bool, running: Arc<AtomicBool>) -> Result<Self> {
        if is_repl {
            println!("Welcome to {}.", DEFAULT_PROMPT);
            println!();
        }

        Ok(Self { is_repl, running, db: Database::new(), settings, query: String::new(), in_comment_block: false })
    }

    fn prompt(&self) -> String {
        if !self.query.trim().is_empty() {
            format!("{} > ", DEFAULT_PROMPT)
        } else {
            match self.settings.prompt.as_deref() {
                Some(prompt) => format!("{} > ", prompt.trim_end()),
                None => format!("{} > ", DEFAULT_PROMPT),
            }
        }
    }

    pub fn handle_repl(&mut self) {
        let config =
            Builder::new().completion_prompt_limit(5).completion_type(CompletionType::Circular).build();
        let mut rl = Editor::<CliHelper, DefaultHistory>::with_config(config).unwrap();
        rl.set_helper(Some(CliHelper::with_keywords(Arc::new(latticedb::parser::token::all_reserved_keywords()))));
        rl.load_history(&history_path()).ok();

        'repl: loop {
            if !self.running.load(Ordering::SeqCst) {
                break 'repl;
            }

            match rl.readline(&self.prompt()) {
                Ok(line) => {
                    let queries = self.append_query(&line);
                    for query in &queries {
                        let _ = rl.add_history_entry(query.as_str());
                        if !self.handle_query(true, query) {
                            break 'repl;
                        }
                    }
                }
                Err(ReadlineError::Io(err)) => eprintln!("io err: {err}"),
                Err(ReadlineError::Interrupted) => {
                    println!("^C");
                    self.query.clear();
                    self.running.store(false, Ordering::SeqCst);
                }
                Err(ReadlineError::Eof) => break 'repl,
                Err(_) => {}
            }
        }

        println!("Bye~");
        let _ = rl.save_history(&history_path());
    }

    pub fn handle_reader<R: BufRead>(&mut self, r: R) -> Result<()> {
        let start = Instant::now();
        for line in r.lines() {
            let line = line.map_err(|e| anyhow!("read lines err: {e}"))?;
            let queries = self.append_query(&line);
            for query in &queries {
                self.handle_query(false, query);
            }
        }

        let trailing = self.query.trim().to_owned();
        if !trailing.is_empty() {
            self.query.clear();
            self.handle_query(false, &trailing);
        }

        println!("{:.3}", start.elapsed().as_secs_f64());
        Ok(())
    }

    /// Buffers partial input across `readline()` calls and splits it into
    /// complete statements on unquoted, uncommented `;`.
    fn append_query(&mut self, line: &str) -> Vec<String> {
        let line = line.trim();
        if line.is_empty() {
            return vec![];
        }

        if !self.settings.get_auto_append_part_cmd() {
            return vec![line.to_owned()];
        }

        if self.query.is_empty()
            && (line.starts_with('.') || line == "exit" || line == "quit" || line.to_uppercase().starts_with("SET"))
        {
            return vec![line.to_owned()];
        }

        self.query.push(' ');

        let mut queries = Vec::new();
        let mut tokenizer = Tokenizer::new(line);
        let mut in_comment = false;
        let mut start = 0;
        let mut comment_block_start = 0;

        while let Some(Ok(token)) = tokenizer.next() {
            match token.kind {
                TokenKind::SemiColon => {
                    if in_comment || self.in_comment_block {
                        continue;
                    }
                    let mut sql = self.query.trim().to_owned();
                    if !sql.is_empty() {
                        sql.push(';');
                        queries.push(sql);
                    }
                    self.query.clear();
                }
                TokenKind::Comment => in_comment = true,
                TokenKind::EOI => in_comment = false,
                TokenKind::Newline => {
                    in_comment = false;
                    self.query.push('\n');
                }
                TokenKind::CommentBlockStart => {
                    if !self.in_comment_block {
                        comment_block_start = token.span.start;
                    }
                    self.in_comment_block = true;
                }
                TokenKind::CommentBlockEnd => {
                    self.in_comment_block = false;
                    self.query.push_str(&line[comment_block_start..token.span.end]);
                }
                _ => {
                    if !in_comment && !self.in_comment_block {
                        self.query.push_str(&line[start..token.span.end]);
                    }
                }
            }
            start = token.span.end;
        }

        if self.in_comment_block {
            self.query.push_str(&line[comment_block_start..]);
        }

        queries
    }

    /// Runs one statement (or control command). Returns `false` when the
    /// session should exit.
    fn handle_query(&mut self, is_repl: bool, query: &str) -> bool {
        let query = query.trim_end_matches(';').trim();
        if query.is_empty() {
            return true;
        }
        if is_repl && (query == "exit" || query == "quit") {
            return false;
        }

        if is_repl && query.starts_with('.') {
            let parts = query.trim_start_matches('.').split_whitespace().collect::<Vec<_>>();
            if parts.len() != 2 {
                eprintln!("control command error, must be of the form `.cmd_name cmd_value`");
                return true;
            }
            if let Err(err) = self.settings.inject_cmd(parts[0], parts[1]) {
                eprintln!("{err}");
            } else {
                log::info!("refreshed config: {:?}", &self.settings);
                eprintln!("OK ~");
            }
            return true;
        }

        let start = Instant::now();
        let show = Show::new_with_start(self.settings.is_show_affected(), is_repl, start);
        let mut affected = 0i64;
        for result in self.db.execute(query) {
            self.print_result(is_repl, &result);
            affected += result.rows.len() as i64;
        }
        show.output(affected);
        true
    }

    fn print_result(&self, _is_repl: bool, result: &StatementResult) {
        if let Some(header) = &result.header {
            println!("{}", header.join(" | "));
            for row in &result.rows {
                println!("{}", row.iter().map(|v| v.display_string()).collect::<Vec<_>>().join(" | "));
            }
        } else if result.ok {
            println!("{}", result.message);
        } else {
            eprintln!("error: {}", result.message);
        }
    }
}

fn history_path() -> String {
    format!("{}/.latticedb_history", std::env::var("HOME").unwrap_or_else(|_| ".".to_string()))
}
