use clap::Args;
use std::path::{Path, PathBuf};

/// Connection settings for the oracle endpoint.
#[derive(Debug, Clone, Args)]
pub struct OracleConfig {
    /// OpenAI-compatible API base, e.g. http://localhost:8000/v1
    #[arg(long, env = "ORACLE_BASE_URL", global = true)]
    pub base_url: Option<String>,
    #[arg(long, env = "ORACLE_API_KEY", global = true, hide_env_values = true)]
    pub api_key: Option<String>,
    #[arg(long, env = "ORACLE_MODEL", default_value = "glm-4-9b-chat", global = true)]
    pub model: String,
    #[arg(long, default_value_t = 4, global = true)]
    pub requests_per_second: u32,
    #[arg(long, default_value_t = 60_000, global = true)]
    pub timeout_ms: u64,
    #[arg(long, default_value_t = 3, global = true)]
    pub max_retries: u32,
}

impl Default for OracleConfig {
    fn default() -> Self {
        Self {
            base_url: None,
            api_key: None,
            model: "glm-4-9b-chat".into(),
            requests_per_second: 4,
            timeout_ms: 60_000,
            max_retries: 3,
        }
    }
}

/// Where each stage reads and writes its artifacts.
#[derive(Debug, Clone)]
pub struct ArtifactPaths {
    pub claims: PathBuf,
    pub programs: PathBuf,
    pub annotations: PathBuf,
    pub verification: PathBuf,
    pub comparison: PathBuf,
    pub propagators: PathBuf,
    pub baseline: PathBuf,
    pub baseline_summary: PathBuf,
}

impl ArtifactPaths {
    pub fn in_dir(dir: &Path) -> Self {
        Self {
            claims: dir.join("claims.json"),
            programs: dir.join("programs.json"),
            annotations: dir.join("annotations.json"),
            verification: dir.join("verification.json"),
            comparison: dir.join("comparison.json"),
            propagators: dir.join("propagators.json"),
            baseline: dir.join("baseline.json"),
            baseline_summary: dir.join("baseline_summary.json"),
        }
    }
}

/// Weights of the basic and augmented pass in the final label.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScoreWeights {
    pub alpha: f64,
    pub beta: f64,
}

impl Default for ScoreWeights {
    fn default() -> Self { Self { alpha: 0.5, beta: 0.5 } }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn artifact_names_live_under_data_dir() {
        let p = ArtifactPaths::in_dir(Path::new("/tmp/run"));
        assert_eq!(p.verification, Path::new("/tmp/run/verification.json"));
        assert_eq!(p.propagators.file_name().unwrap(), "propagators.json");
    }
}
