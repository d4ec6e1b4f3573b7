//! `gridsql`: an interactive SQL shell that shows every generated statement
//! and asks before applying it.

mod config;
mod grid;
mod keys;
mod logging;
mod reader;
mod repl;
mod render;

use anyhow::{Context, Result};
use clap::Parser;
use config::Config;
use grid::PromptGrid;
use gridsql_drivers::{DialectRegistry, DriverRegistry};
use gridsql_edit::{DEFAULT_NULL, EditSession, LineKeys, ScriptedKeys, SessionSettings};
use keys::SharedKeys;
use repl::{Input, Repl};
use std::fs::File;
use std::io::{BufReader, IsTerminal};
use std::path::PathBuf;
use std::sync::Arc;

#[derive(Parser, Debug)]
#[command(name = "gridsql", version, about = "SQL shell with confirm-before-apply table editing")]
struct Cli {
    /// `<engine> <dsn>`, a single `<scheme>:<dsn>`, or a connection alias
    #[arg(required_unless_present = "list_dialects")]
    args: Vec<String>,

    /// Run statements from a file, then exit
    #[arg(short = 'f', long = "script", value_name = "FILE")]
    script: Option<PathBuf>,

    /// Scripted key sequence for prompts and the grid editor; `|` is Enter
    #[arg(long, value_name = "KEYS")]
    auto: Option<String>,

    /// Text shown for NULL in the grid
    #[arg(long, env = "GRIDSQL_NULL", value_name = "TEXT")]
    null: Option<String>,

    /// Start spooling to a file
    #[arg(long, value_name = "FILE")]
    spool: Option<String>,

    /// Write the spool with CRLF line endings
    #[arg(long, default_value_t = false)]
    crlf: bool,

    /// Configuration file (default: <config dir>/gridsql/config.toml)
    #[arg(long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Print the registered dialects and exit
    #[arg(long, default_value_t = false)]
    list_dialects: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let config = Config::load(cli.config.as_deref())?;
    logging::init(config.log.filter.as_deref())?;

    let dialects = DialectRegistry::with_defaults();
    if cli.list_dialects {
        for name in dialects.names() {
            if let Some(dialect) = dialects.get(name) {
                println!("{:<12}{}", name, dialect.usage);
            }
        }
        return Ok(());
    }

    let args = config.resolve_args(&cli.args);
    let info = dialects.find_from_args(&args)?;
    let conn = DriverRegistry::with_defaults()
        .connect(&info)
        .await
        .with_context(|| format!("Failed to connect with {}", info.engine))?;

    let settings = SessionSettings {
        null: cli
            .null
            .clone()
            .or_else(|| config.null.clone())
            .unwrap_or_else(|| DEFAULT_NULL.to_string()),
        spool_crlf: cli.crlf || config.spool_crlf,
    };
    let session = EditSession::new(conn, Arc::clone(&info.dialect), settings);

    let interactive = cli.script.is_none() && std::io::stdin().is_terminal();
    let stdin = SharedKeys::new(LineKeys::new(BufReader::new(std::io::stdin())));
    let keys = match &cli.auto {
        Some(script) => SharedKeys::new(ScriptedKeys::new(script)),
        None => stdin.clone(),
    };
    let grid = PromptGrid::new(keys.clone(), Box::new(std::io::stdout()))
        .with_echo(!interactive || cli.auto.is_some());
    let mut repl = Repl::new(session, keys, grid, Box::new(std::io::stdout()))
        .with_auto_commit_prompt(config.auto_commit_prompt);

    if let Some(spool) = &cli.spool {
        repl.spool(spool)?;
    }

    let result = match &cli.script {
        Some(path) => match File::open(path) {
            Ok(file) => {
                let mut source = LineKeys::new(BufReader::new(file));
                repl.run(&mut source, Input::Script).await
            }
            Err(err) => Err(anyhow::Error::new(err)
                .context(format!("Failed to open script: {:?}", path))),
        },
        None => {
            let mut source = stdin.clone();
            let input = if interactive { Input::Terminal } else { Input::Piped };
            repl.run(&mut source, input).await
        }
    };
    let finished = repl.finish().await;
    result?;
    finished
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_args_parse() {
        let cli = Cli::try_parse_from([
            "gridsql", "--null", "~", "--crlf", "-f", "run.sql", "sqlite3", ":memory:",
        ])
        .unwrap();
        assert_eq!(cli.args, vec!["sqlite3", ":memory:"]);
        assert_eq!(cli.null.as_deref(), Some("~"));
        assert!(cli.crlf);
        assert_eq!(cli.script, Some(PathBuf::from("run.sql")));
    }

    #[test]
    fn test_connection_args_required() {
        assert!(Cli::try_parse_from(["gridsql"]).is_err());
        assert!(Cli::try_parse_from(["gridsql", "--list-dialects"]).is_ok());
    }
}
