//! `bplan shell`: run many subcommands against one manager.
//!
//! Each input line is split with shell quoting rules and parsed as a
//! subcommand. Blank lines and `#` comments are skipped; `exit` or `quit`
//! ends the session. A failing line prints an `Error:` line and the session
//! continues.

use std::io::{BufRead, Write};

use anyhow::{Context, Result};
use clap::Parser;

use bplan_core::BuildPlanManager;

use crate::{Commands, execute, report};

/// One shell input line.
#[derive(Parser, Debug)]
#[command(name = "bplan", no_binary_name = true, disable_version_flag = true)]
struct ShellLine {
    #[command(subcommand)]
    command: Commands,
}

/// Split a line into words. `None` for unbalanced quotes.
pub fn split_line(line: &str) -> Option<Vec<String>> {
    shlex::split(line)
}

/// Read lines from `input` until EOF or `exit`. With `interactive`, a
/// prompt is written to `out` before each line.
pub async fn run_shell<R: BufRead>(
    manager: &BuildPlanManager,
    input: R,
    interactive: bool,
    out: &mut dyn Write,
    err: &mut dyn Write,
) -> Result<()> {
    let mut executed = 0usize;

    if interactive {
        write!(out, "bplan> ")?;
        out.flush()?;
    }

    for line in input.lines() {
        let line = line.context("failed to read shell input")?;
        let trimmed = line.trim();

        if matches!(trimmed, "exit" | "quit") {
            break;
        }
        if !trimmed.is_empty() && !trimmed.starts_with('#') {
            run_line(manager, trimmed, out, err).await;
            executed += 1;
        }

        if interactive {
            write!(out, "bplan> ")?;
            out.flush()?;
        }
    }

    tracing::debug!(executed, "shell session finished");
    Ok(())
}

async fn run_line(manager: &BuildPlanManager, line: &str, out: &mut dyn Write, err: &mut dyn Write) {
    let Some(words) = split_line(line) else {
        report(
            Err(anyhow::anyhow!("unbalanced quotes in {line:?}")),
            err,
        );
        return;
    };

    match ShellLine::try_parse_from(words) {
        Ok(parsed) => report(execute(manager, parsed.command, out).await, err),
        Err(e) if e.use_stderr() => {
            let _ = write!(err, "{}", e.render());
        }
        // --help output
        Err(e) => {
            let _ = write!(out, "{}", e.render());
        }
    }
}
