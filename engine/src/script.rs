//! Sequential script executor.
//!
//! A script is a plain list of statements, one per line. Everything after a
//! `--` marker is a comment. `PRAGMA` lines and transaction boundaries are
//! skipped: version and transaction pragmas belong to the engine, not to
//! script content.

use std::io::BufRead;

use tracing::{debug, warn};
use triplog_core::RowStore;

use crate::error::{EngineError, Result};

const COMMENT_MARKER: &str = "--";

/// Counters from one script run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ScriptStats {
    /// Statements submitted to the store.
    pub executed: usize,
    /// Non-blank lines skipped as pragmas or transaction boundaries.
    pub skipped: usize,
}

/// Applies the script read from `reader` to `store`, one statement per line.
///
/// The reader is consumed and dropped before this returns, on success and on
/// failure alike. A read error ends the script early with a warning; a
/// statement failure aborts with [`EngineError::Script`] naming `script_name`.
///
/// # Examples
///
/// ```ignore
/// let stats = apply_script(&store, "upg_v0902.sql", reader)?;
/// println!("{} statements", stats.executed);
/// ```
pub fn apply_script<S, R>(store: &S, script_name: &str, reader: R) -> Result<ScriptStats>
where
    S: RowStore + ?Sized,
    R: BufRead,
{
    let mut stats = ScriptStats::default();
    let outcome = run_lines(store, script_name, reader, &mut stats);
    outcome.map(|()| stats)
}

fn run_lines<S, R>(store: &S, script_name: &str, reader: R, stats: &mut ScriptStats) -> Result<()>
where
    S: RowStore + ?Sized,
    R: BufRead,
{
    for (number, line) in reader.lines().enumerate() {
        let line = match line {
            Ok(line) => line,
            Err(e) => {
                warn!(script = script_name, line = number + 1, error = %e, "Failed reading script, stopping");
                break;
            }
        };
        match classify(&line) {
            Line::Blank => {}
            Line::Skipped => {
                debug!(script = script_name, line = number + 1, "Skipping pragma or transaction line");
                stats.skipped += 1;
            }
            Line::Statement(sql) => {
                store.exec_raw(sql).map_err(|source| EngineError::Script {
                    script: script_name.to_string(),
                    source,
                })?;
                stats.executed += 1;
            }
        }
    }
    Ok(())
}

#[derive(Debug, PartialEq, Eq)]
enum Line<'a> {
    Blank,
    Skipped,
    Statement(&'a str),
}

fn classify(line: &str) -> Line<'_> {
    let code = match line.find(COMMENT_MARKER) {
        Some(0) => return Line::Blank,
        Some(at) => &line[..at],
        None => line,
    };
    let code = code.trim();
    if code.is_empty() {
        Line::Blank
    } else if is_pragma(code) || is_transaction_boundary(code) {
        Line::Skipped
    } else {
        Line::Statement(code)
    }
}

fn starts_with_word(text: &str, word: &str) -> bool {
    text.get(..word.len())
        .is_some_and(|head| head.eq_ignore_ascii_case(word))
        && text[word.len()..]
            .chars()
            .next()
            .is_none_or(|c| !c.is_ascii_alphanumeric() && c != '_')
}

fn is_pragma(code: &str) -> bool {
    starts_with_word(code, "PRAGMA")
}

fn is_transaction_boundary(code: &str) -> bool {
    ["BEGIN", "COMMIT", "END", "ROLLBACK"]
        .iter()
        .any(|word| starts_with_word(code, word))
}
