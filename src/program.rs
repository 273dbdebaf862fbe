//! Lexing and parsing of generated reasoning programs.
//!
//! The oracle writes Python-flavoured pseudo code such as
//!
//! ```text
//! def program():
//!     answer_1 = Question("Who founded the company?")
//!     fact_1 = Verify(f"{answer_1} founded the company in 1998.")
//!     label = Predict(fact_1)
//! #end
//! ```
//!
//! Only assignment lines calling one of the three reserved functions are
//! commands. Everything else (the wrapper, comments, prose) is dropped.
//! Malformed command lines are skipped individually.

use crate::types::Command;
use regex::Regex;
use std::sync::LazyLock;
use tracing::warn;

const MARKERS: [&str; 3] = ["= Question", "= Verify", "= Predict"];

static ASSIGNMENT: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(?P<name>[A-Za-z_][A-Za-z0-9_]*)\s*=\s*(?P<kw>Question|Verify|Predict)\b\s*(?P<rest>.*)$")
        .expect("valid regex")
});

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ParseError {
    #[error("not an assignment to Question/Verify/Predict: {0}")]
    NotACommand(String),
    #[error("empty argument in: {0}")]
    EmptyArgument(String),
}

/// Trimmed lines carrying one of the reserved markers, in program order.
pub fn extract_commands(program: &str) -> Vec<&str> {
    program
        .lines()
        .map(str::trim)
        .filter(|l| !l.is_empty() && !l.starts_with('#'))
        .filter(|l| MARKERS.iter().any(|m| l.contains(m)))
        .collect()
}

/// Parses one marker line into a typed command.
pub fn parse_command(line: &str) -> Result<Command, ParseError> {
    let caps = ASSIGNMENT
        .captures(line.trim())
        .ok_or_else(|| ParseError::NotACommand(line.to_string()))?;
    let binding = caps["name"].to_string();
    let arg = unwrap_argument(&caps["rest"]);
    if arg.is_empty() {
        return Err(ParseError::EmptyArgument(line.to_string()));
    }
    let arg = arg.to_string();
    Ok(match &caps["kw"] {
        "Question" => Command::Question { binding, question: arg },
        "Verify" => Command::Verify { binding, template: arg },
        _ => Command::Predict { expression: arg },
    })
}

/// Extracts and parses every command, skipping (and logging) bad lines.
pub fn parse_program(program: &str) -> Vec<Command> {
    extract_commands(program)
        .into_iter()
        .filter_map(|line| match parse_command(line) {
            Ok(cmd) => Some(cmd),
            Err(e) => {
                warn!(error = %e, "skipping command line");
                None
            }
        })
        .collect()
}

/// Peels the call syntax off `("...").`, leaving the argument text.
///
/// Stripping is lenient: a missing closing paren or quote is tolerated, and
/// punctuation inside the quotes (such as a sentence-final period) is kept.
fn unwrap_argument(rest: &str) -> &str {
    let mut s = strip_inline_comment(rest).trim().trim_end_matches(|c: char| c == '.' || c == ';' || c.is_whitespace());
    if let Some(inner) = s.strip_prefix('(') {
        s = inner.strip_suffix(')').unwrap_or(inner).trim();
    }
    s = s.strip_prefix(['f', 'F']).filter(|r| r.starts_with(['"', '\''])).unwrap_or(s);
    for q in ["\"\"\"", "'''", "\"", "'"] {
        if let Some(inner) = s.strip_prefix(q) {
            s = inner.strip_suffix(q).unwrap_or(inner);
            break;
        }
    }
    s.trim()
}

/// Cuts a `# ...` tail that sits outside any quotes.
fn strip_inline_comment(line: &str) -> &str {
    let mut quote = None;
    let mut escaped = false;
    for (i, c) in line.char_indices() {
        match quote {
            Some(_) if escaped => escaped = false,
            Some(_) if c == '\\' => escaped = true,
            Some(q) if c == q => quote = None,
            Some(_) => {}
            None if c == '"' || c == '\'' => quote = Some(c),
            None if c == '#' => return &line[..i],
            None => {}
        }
    }
    line
}
