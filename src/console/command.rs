use std::path::PathBuf;

use once_cell::sync::Lazy;
use regex::Regex;

pub const HELP_COMMAND: &str = "help";
pub const HELP_COMMAND_SHORT: &str = "h";
pub const QUIT_COMMAND: &str = "quit";
pub const QUIT_COMMAND_SHORT: &str = "q";
pub const AT_PREFIX: &str = "@";

/// `@<file>:<line>:<col>`, positions are 1-based.
static AT_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^@(?P<file>.+):(?P<line>\d+):(?P<col>\d+)$").expect("must compile"));

#[derive(Debug, PartialEq)]
pub enum Command {
    Help,
    Quit,
    /// Preview whatever the action provider finds at a source position.
    At {
        file: PathBuf,
        line: usize,
        column: usize,
    },
    /// Preview an expression.
    Preview(String),
}

#[derive(Debug, PartialEq, thiserror::Error)]
pub enum CommandError {
    #[error("empty input")]
    Empty,
    #[error("expect `@<file>:<line>:<column>` with 1-based line and column, got `{0}`")]
    BadPosition(String),
}

impl Command {
    pub fn parse(input: &str) -> Result<Command, CommandError> {
        let input = input.trim();
        match input {
            "" => Err(CommandError::Empty),
            HELP_COMMAND | HELP_COMMAND_SHORT => Ok(Command::Help),
            QUIT_COMMAND | QUIT_COMMAND_SHORT => Ok(Command::Quit),
            at if at.starts_with(AT_PREFIX) => {
                let bad = || CommandError::BadPosition(at.to_string());
                let caps = AT_RE.captures(at).ok_or_else(bad)?;
                let line: usize = caps["line"].parse().map_err(|_| bad())?;
                let column: usize = caps["col"].parse().map_err(|_| bad())?;
                if line == 0 || column == 0 {
                    return Err(bad());
                }
                Ok(Command::At {
                    file: PathBuf::from(&caps["file"]),
                    line,
                    column,
                })
            }
            expression => Ok(Command::Preview(expression.to_string())),
        }
    }
}
