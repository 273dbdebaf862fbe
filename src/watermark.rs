use regex::Regex;
use std::fs::File;
use std::io::{BufRead, BufReader, Read};
use std::path::Path;
use std::sync::LazyLock;
use tracing::{debug, warn};

static ID_FIELD: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#""id"\s*:\s*(\d+)"#).expect("valid regex"));

/// Highest `"id"` value found in a possibly truncated array file.
///
/// The file is scanned line by line with a pattern rather than parsed, so an
/// array cut off mid-record still yields the ids written before the crash.
/// Missing, empty or unreadable files give `0`; nothing here returns an error.
pub fn read_watermark(path: &Path) -> u64 {
    let file = match File::open(path) {
        Ok(f) => f,
        Err(e) => {
            debug!(path = %path.display(), error = %e, "no output artifact yet");
            return 0;
        }
    };

    let mut max_id = 0u64;
    for line in BufReader::new(file).lines() {
        let line = match line {
            Ok(l) => l,
            Err(e) => {
                warn!(path = %path.display(), error = %e, "watermark scan failed, restarting from 0");
                return 0;
            }
        };
        for cap in ID_FIELD.captures_iter(&line) {
            match cap[1].parse::<u64>() {
                Ok(n) => max_id = max_id.max(n),
                Err(e) => warn!(raw = &cap[1], error = %e, "ignoring unparseable id"),
            }
        }
    }
    max_id
}

/// Structural state of an output artifact, as far as the batch writer cares.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArtifactState {
    /// Absent or only whitespace.
    Empty,
    /// Opening token present, closing token not yet written.
    ///
    /// The first `complete_len` bytes end in the opening token or in the last
    /// of `records` whole records. `torn` is set when anything other than
    /// whitespace follows them.
    Open { records: usize, complete_len: u64, torn: bool },
    /// The outer array is closed.
    Sealed,
    /// Non-empty but does not start with an array.
    Corrupt,
}

/// Classifies an artifact by walking its top-level structure.
pub fn artifact_state(path: &Path) -> std::io::Result<ArtifactState> {
    let mut buf = Vec::new();
    match File::open(path) {
        Ok(mut f) => { f.read_to_end(&mut buf)?; }
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(ArtifactState::Empty),
        Err(e) => return Err(e),
    }
    Ok(classify(&buf))
}

fn classify(buf: &[u8]) -> ArtifactState {
    let Some(start) = buf.iter().position(|b| !b.is_ascii_whitespace()) else {
        return ArtifactState::Empty;
    };
    if buf[start] != b'[' {
        return ArtifactState::Corrupt;
    }

    // depth counts nesting below the outer array
    let mut depth = 0usize;
    let mut in_string = false;
    let mut escaped = false;
    let mut records = 0;
    let mut complete_len = start + 1;
    for (i, &b) in buf.iter().enumerate().skip(start + 1) {
        if in_string {
            if escaped {
                escaped = false;
            } else if b == b'\\' {
                escaped = true;
            } else if b == b'"' {
                in_string = false;
            }
            continue;
        }
        match b {
            b'"' => in_string = true,
            b'{' | b'[' => depth += 1,
            b'}' | b']' if depth > 0 => {
                depth -= 1;
                if depth == 0 {
                    records += 1;
                    complete_len = i + 1;
                }
            }
            b']' => return ArtifactState::Sealed,
            b'}' => return ArtifactState::Corrupt,
            _ => {}
        }
    }

    let torn = buf[complete_len..].iter().any(|b| !b.is_ascii_whitespace());
    ArtifactState::Open { records, complete_len: complete_len as u64, torn }
}
