use std::fs;
use std::path::Path;

use anyhow::Result;
use serde_derive::{Deserialize, Serialize};

pub const DEFAULT_PROMPT: &str = "latticedb";

/// Session settings, loadable from a YAML file and adjustable at runtime
/// through `.cmd_name value` control commands.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConfigLoad {
    /// prompt
    pub prompt: Option<String>,

    /// Show stats after executing queries. Only works in non-interactive mode.
    pub show_stats: Option<bool>,

    /// Treat unterminated input as a statement fragment to be continued on
    /// the next line, splitting on `;` instead. Default false.
    auto_append_part_cmd: Option<bool>,
    /// The symbol that terminates a statement when `auto_append_part_cmd` is set.
    auto_append_part_cmd_symbol: Option<char>,

    /// Multi line mode, default true.
    pub multi_line: Option<bool>,

    cli: Option<CliConfig>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
struct CliConfig {
    /// Show rows affected after each statement.
    show_affected: Option<bool>,
}

impl Default for ConfigLoad {
    fn default() -> Self {
        ConfigLoad {
            prompt: Some(DEFAULT_PROMPT.to_string()),
            show_stats: Some(false),
            auto_append_part_cmd: Some(false),
            auto_append_part_cmd_symbol: Some(';'),
            multi_line: Some(true),
            cli: Some(CliConfig::default()),
        }
    }
}

impl ConfigLoad {
    /// Loads settings from `path`, falling back to defaults when the file
    /// is absent so a fresh checkout works with no setup.
    pub fn new(path: &str) -> Result<Self> {
        if !Path::new(path).exists() {
            return Ok(ConfigLoad::default());
        }
        let text = fs::read_to_string(path)?;
        Ok(serde_yaml::from_str(&text)?)
    }

    pub fn is_show_affected(&self) -> bool {
        self.cli.as_ref().and_then(|c| c.show_affected).unwrap_or(false)
    }

    pub fn get_auto_append_part_cmd(&self) -> bool {
        self.auto_append_part_cmd.unwrap_or(false)
    }

    pub fn get_auto_append_part_cmd_symbol(&self) -> char {
        self.auto_append_part_cmd_symbol.unwrap_or(';')
    }

    /// `show_progress`、`show_stats`、`show_affected`、`auto_append_part_cmd`、
    /// `auto_append_part_cmd_symbol`、`multi_line`
    pub fn inject_cmd(&mut self, cmd_name: &str, cmd_value: &str) -> Result<()> {
        match cmd_name {
            "show_affected" => self.set_show_affected(cmd_value.parse()?),
            "show_stats" => self.show_stats = Some(cmd_value.parse()?),
            "auto_append_part_cmd" => self.auto_append_part_cmd = Some(cmd_value.parse()?),
            "auto_append_part_cmd_symbol" => self.auto_append_part_cmd_symbol = Some(cmd_value.parse()?),
            "multi_line" => self.multi_line = Some(cmd_value.parse()?),
            _ => return Err(anyhow::anyhow!("Unknown command: {}", cmd_name)),
        }
        Ok(())
    }

    pub fn terminal_update(&mut self) {
        self.set_show_affected(true);
        self.show_stats = Some(true);
    }

    fn set_show_affected(&mut self, v: bool) {
        match self.cli.as_mut() {
            None => self.cli = Some(CliConfig { show_affected: Some(v) }),
            Some(c) => c.show_affected = Some(v),
        }
    }
}
