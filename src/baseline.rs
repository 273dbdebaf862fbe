//! Direct true/false prompting without a reasoning program, for comparison.

use crate::batch::Stage;
use crate::llm::Oracle;
use crate::scoring::Confusion;
use crate::types::{ClaimRecord, Metrics};
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use tracing::warn;

const MAX_BASELINE_TOKENS: u32 = 16;

fn build_baseline_prompt(claim: &str) -> String {
    format!(
        "\nBased on the following statement:\n\"{claim}\"\n\
         Is the statement true (1) or false (0)? Please respond with only 1 or 0.\n"
    )
}

/// `1` if the reply contains a one, else `0` if it contains a zero.
pub fn parse_binary(reply: &str) -> Option<u8> {
    if reply.contains('1') {
        Some(1)
    } else if reply.contains('0') {
        Some(0)
    } else {
        None
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BaselineRecord {
    pub id: u64,
    #[serde(rename = "Claim")]
    pub claim: String,
    /// `None` when the reply carried neither digit.
    #[serde(rename = "Prediction")]
    pub prediction: Option<u8>,
    #[serde(rename = "Label", default)]
    pub label: Option<u8>,
}

pub struct Baseline<'a> {
    oracle: &'a dyn Oracle,
}

impl<'a> Baseline<'a> {
    pub fn new(oracle: &'a dyn Oracle) -> Self { Self { oracle } }

    pub async fn classify(&self, claim: &ClaimRecord) -> Result<BaselineRecord> {
        let text = claim
            .claim
            .as_deref()
            .filter(|c| !c.trim().is_empty())
            .with_context(|| format!("claim {} has no text", claim.id))?;
        let reply = self
            .oracle
            .generate(&build_baseline_prompt(text), MAX_BASELINE_TOKENS, true)
            .await?;
        let prediction = parse_binary(&reply);
        if prediction.is_none() {
            warn!(id = claim.id, reply = %reply, "baseline reply has no label");
        }
        Ok(BaselineRecord {
            id: claim.id,
            claim: text.to_string(),
            prediction,
            label: claim.label.map(|l| l.0),
        })
    }
}

#[async_trait::async_trait]
impl Stage for Baseline<'_> {
    type Input = ClaimRecord;
    type Output = BaselineRecord;

    fn name(&self) -> &'static str { "baseline" }

    fn id_of(&self, input: &ClaimRecord) -> u64 { input.id }

    async fn process(&self, input: &ClaimRecord) -> Result<BaselineRecord> {
        self.classify(input).await
    }
}

/// Metrics over labelled baseline rows. An unparseable prediction counts as
/// wrong on either class.
pub fn baseline_metrics(records: &[BaselineRecord]) -> Metrics {
    let mut confusion = Confusion::default();
    for r in records {
        let Some(truth) = r.label else { continue };
        let predicted = r.prediction.unwrap_or(1 - truth);
        confusion.record(predicted, truth);
    }
    confusion.metrics()
}

/// Per-class counts and accuracies written next to the baseline rows.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BaselineSummary {
    pub total: usize,
    pub correct: usize,
    pub total_accuracy: f64,
    pub true_total: usize,
    pub true_correct: usize,
    pub true_accuracy: f64,
    pub false_total: usize,
    pub false_correct: usize,
    pub false_accuracy: f64,
    pub metrics: Metrics,
}

pub fn summarize(records: &[BaselineRecord]) -> BaselineSummary {
    let ratio = |n: usize, d: usize| if d == 0 { 0.0 } else { n as f64 / d as f64 };
    let labelled = || records.iter().filter_map(|r| r.label.map(|truth| (truth, r.prediction == Some(truth))));

    let true_total = labelled().filter(|(t, _)| *t == 1).count();
    let true_correct = labelled().filter(|(t, ok)| *t == 1 && *ok).count();
    let false_total = labelled().filter(|(t, _)| *t == 0).count();
    let false_correct = labelled().filter(|(t, ok)| *t == 0 && *ok).count();
    let total = labelled().count();
    let correct = labelled().filter(|(_, ok)| *ok).count();

    BaselineSummary {
        total,
        correct,
        total_accuracy: ratio(correct, total),
        true_total,
        true_correct,
        true_accuracy: ratio(true_correct, true_total),
        false_total,
        false_correct,
        false_accuracy: ratio(false_correct, false_total),
        metrics: baseline_metrics(records),
    }
}
