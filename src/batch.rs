//! Resumable append-only array output shared by every batch stage.
//!
//! On disk an artifact moves through `[` → `[ rec, rec, ...` → `[ ... ]`.
//! Each record is written with a leading separator and synced before
//! `append` returns. A crash can leave at most one partial record at the tail;
//! `BatchWriter::open` cuts it back to the last whole record before the
//! watermark is read, so the resumed run recomputes it.

use crate::watermark::{artifact_state, read_watermark, ArtifactState};
use crate::{Error, Result};
use serde::Serialize;
use std::fs::{File, OpenOptions};
use std::future::Future;
use std::io::Write;
use std::path::Path;
use tracing::{debug, info, warn};

const OPEN: &[u8] = b"[\n";
const SEPARATOR: &[u8] = b",\n";
const CLOSE: &[u8] = b"\n]\n";

pub enum OpenOutcome {
    Ready(BatchWriter),
    /// The artifact already carries its closing token; nothing may be appended.
    AlreadySealed { watermark: u64 },
}

pub struct BatchWriter {
    file: File,
    watermark: u64,
    has_records: bool,
    committed: usize,
}

impl BatchWriter {
    /// Opens `path` for appending, writing the opening token only if the
    /// file does not carry one yet. A partial trailing record is discarded.
    pub fn open(path: &Path) -> Result<OpenOutcome> {
        let state = artifact_state(path)?;
        match state {
            ArtifactState::Sealed => {
                return Ok(OpenOutcome::AlreadySealed { watermark: read_watermark(path) });
            }
            ArtifactState::Corrupt => return Err(Error::CorruptArtifact(path.to_path_buf())),
            ArtifactState::Empty | ArtifactState::Open { .. } => {}
        }

        let mut file = OpenOptions::new().create(true).append(true).open(path)?;
        let has_records = match state {
            ArtifactState::Open { records, complete_len, torn } => {
                if torn {
                    warn!(path = %path.display(), kept = records, "discarding partial record at end of artifact");
                }
                if file.metadata()?.len() != complete_len || records == 0 {
                    file.set_len(complete_len)?;
                    if records == 0 {
                        file.write_all(b"\n")?;
                    }
                    file.sync_data()?;
                }
                records > 0
            }
            _ => {
                file.write_all(OPEN)?;
                file.flush()?;
                false
            }
        };

        let watermark = read_watermark(path);
        debug!(path = %path.display(), watermark, ?state, "opened output artifact");
        Ok(OpenOutcome::Ready(Self { file, watermark, has_records, committed: 0 }))
    }

    /// Highest id durably present when the writer was opened.
    pub fn watermark(&self) -> u64 { self.watermark }

    /// Writes `record` and syncs it before returning.
    pub fn append<R: Serialize>(&mut self, record: &R) -> Result<()> {
        let bytes = serde_json::to_vec_pretty(record)?;
        if self.has_records {
            self.file.write_all(SEPARATOR)?;
        }
        self.file.write_all(&bytes)?;
        self.file.flush()?;
        self.file.sync_data()?;
        self.has_records = true;
        self.committed += 1;
        Ok(())
    }

    /// Leaves the array open for a later resume.
    pub fn suspend(mut self) -> Result<usize> {
        self.file.flush()?;
        Ok(self.committed)
    }

    /// Writes the closing token. Terminal.
    pub fn seal(mut self) -> Result<usize> {
        self.file.write_all(CLOSE)?;
        self.file.flush()?;
        self.file.sync_all()?;
        Ok(self.committed)
    }
}

/// One per-claim batch transformation.
#[async_trait::async_trait]
pub trait Stage: Send + Sync {
    type Input: Send + Sync;
    type Output: Serialize + Send;

    fn name(&self) -> &'static str;
    fn id_of(&self, input: &Self::Input) -> u64;
    async fn process(&self, input: &Self::Input) -> anyhow::Result<Self::Output>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StageState {
    /// Input exhausted and the artifact sealed.
    Completed,
    /// Stopped by the shutdown signal; the artifact stays open.
    Interrupted,
    /// The artifact was sealed by an earlier run.
    AlreadyComplete,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BatchSummary {
    pub written: usize,
    pub skipped_existing: usize,
    pub failed: usize,
    pub state: StageState,
}

/// Drives `stage` over `inputs` in ascending id order, appending each result
/// to `output` as soon as it is known.
///
/// Items at or below the artifact's watermark are skipped. A failing item is
/// logged and dropped; writer I/O errors abort the run. When `shutdown`
/// resolves, the in-flight item is abandoned and the artifact is left open.
pub async fn run_stage<S, F>(stage: &S, inputs: &[S::Input], output: &Path, shutdown: F) -> Result<BatchSummary>
where
    S: Stage,
    F: Future<Output = ()>,
{
    let mut writer = match BatchWriter::open(output)? {
        OpenOutcome::Ready(w) => w,
        OpenOutcome::AlreadySealed { watermark } => {
            info!(stage = stage.name(), watermark, path = %output.display(), "artifact already complete");
            return Ok(BatchSummary { written: 0, skipped_existing: 0, failed: 0, state: StageState::AlreadyComplete });
        }
    };
    let watermark = writer.watermark();
    info!(stage = stage.name(), watermark, "last processed id");

    let mut ordered: Vec<&S::Input> = inputs.iter().collect();
    ordered.sort_by_key(|i| stage.id_of(i));
    ordered.dedup_by_key(|i| stage.id_of(i));

    let mut summary = BatchSummary { written: 0, skipped_existing: 0, failed: 0, state: StageState::Completed };
    tokio::pin!(shutdown);

    for input in ordered {
        let id = stage.id_of(input);
        if id <= watermark {
            summary.skipped_existing += 1;
            continue;
        }

        let outcome = tokio::select! {
            biased;
            _ = &mut shutdown => None,
            r = stage.process(input) => Some(r),
        };
        let Some(result) = outcome else {
            summary.state = StageState::Interrupted;
            break;
        };

        match result {
            Ok(record) => {
                writer.append(&record)?;
                summary.written += 1;
                info!(stage = stage.name(), id, "processed");
            }
            Err(e) => {
                summary.failed += 1;
                let reason = format!("{e:#}");
                warn!(stage = stage.name(), id, error = %reason, "skipping item");
            }
        }
    }

    match summary.state {
        StageState::Interrupted => {
            writer.suspend()?;
            warn!(stage = stage.name(), written = summary.written, "interrupted, artifact left open for resume");
        }
        _ => {
            writer.seal()?;
            info!(stage = stage.name(), written = summary.written, failed = summary.failed, "artifact sealed");
        }
    }
    Ok(summary)
}
