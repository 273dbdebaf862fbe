//! Program-guided claim verification.
//!
//! A claim is turned into a small reasoning program by an oracle, the
//! program's `Question`/`Verify` steps are executed against the oracle twice
//! (plain and conditioned on the claim's emotional framing), and the
//! per-claim verdicts are aggregated into a label, accuracy statistics and a
//! list of likely rumour propagators. Every oracle-heavy stage streams its
//! output through a resumable append-only array writer.

pub mod annotation;
pub mod baseline;
pub mod batch;
pub mod config;
pub mod generation;
pub mod llm;
pub mod program;
pub mod scoring;
pub mod segments;
pub mod substitute;
pub mod types;
pub mod verification;
pub mod watermark;

use std::path::{Path, PathBuf};

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("input artifact {} does not exist", .0.display())]
    MissingInput(PathBuf),

    #[error("input artifact {} is not a valid array: {source}", .path.display())]
    InvalidArtifact { path: PathBuf, source: serde_json::Error },

    #[error("output artifact {} does not start with an array", .0.display())]
    CorruptArtifact(PathBuf),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("serialization error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Reads a sealed JSON array artifact in full.
///
/// Unlike the watermark scan this requires a complete, valid file.
pub fn load_array<T: serde::de::DeserializeOwned>(path: &Path) -> Result<Vec<T>> {
    let file = std::fs::File::open(path).map_err(|e| match e.kind() {
        std::io::ErrorKind::NotFound => Error::MissingInput(path.to_path_buf()),
        _ => Error::Io(e),
    })?;
    serde_json::from_reader(std::io::BufReader::new(file))
        .map_err(|source| Error::InvalidArtifact { path: path.to_path_buf(), source })
}
