use crate::annotation::AnnotationTable;
use crate::config::ScoreWeights;
use crate::types::*;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;
use tracing::{info, warn};

/// True-verdict counts of one claim.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ClaimScore {
    pub fact_score: usize,
    pub fact_with_score: usize,
    pub all_num: usize,
}

impl ClaimScore {
    pub fn of(rec: &VerificationRecord) -> Self {
        Self {
            fact_score: rec.basic.values().filter(|v| v.is_true()).count(),
            fact_with_score: rec.augmented.values().filter(|v| v.is_true()).count(),
            all_num: rec.basic.len(),
        }
    }

    fn basic_unanimous(&self) -> bool { self.fact_score == self.all_num }

    fn augmented_unanimous(&self) -> bool { self.fact_with_score == self.all_num }

    /// `1` only when the weighted pass ratios sum to one, i.e. both passes
    /// found every fact true. `None` when the claim has no facts.
    pub fn label(&self, w: ScoreWeights) -> Option<u8> {
        if self.all_num == 0 {
            return None;
        }
        let n = self.all_num as f64;
        let s = w.alpha * (self.fact_score as f64 / n) + w.beta * (self.fact_with_score as f64 / n);
        Some(u8::from((s - 1.0).abs() < 1e-9))
    }
}

/// A claim predicted false whose framing is both hostile and manipulative.
pub fn is_potential_propagator(label: u8, emotion: Emotion, technique: Option<NarrativeTechnique>) -> bool {
    label == 0 && emotion.is_negative() && technique.is_some_and(NarrativeTechnique::is_manipulative)
}

/// Confusion-matrix counts with label `1` (real) as the positive class.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Confusion {
    pub tp: usize,
    pub fp: usize,
    pub fn_: usize,
    pub tn: usize,
}

impl Confusion {
    pub fn record(&mut self, predicted: u8, truth: u8) {
        match (predicted, truth) {
            (1, 1) => self.tp += 1,
            (1, _) => self.fp += 1,
            (_, 1) => self.fn_ += 1,
            _ => self.tn += 1,
        }
    }

    pub fn total(&self) -> usize { self.tp + self.fp + self.fn_ + self.tn }

    pub fn metrics(&self) -> Metrics {
        let ratio = |a: usize, b: usize| if b > 0 { a as f64 / b as f64 } else { 0.0 };
        let precision = ratio(self.tp, self.tp + self.fp);
        let recall = ratio(self.tp, self.tp + self.fn_);
        let f1 = if precision + recall > 0.0 { 2.0 * precision * recall / (precision + recall) } else { 0.0 };
        Metrics {
            accuracy: ratio(self.tp + self.tn, self.total()),
            precision,
            recall,
            f1,
            real_accuracy: ratio(self.tp, self.tp + self.fn_),
            fake_accuracy: ratio(self.tn, self.tn + self.fp),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Diagnostics {
    /// Passes disagree and only the basic pass was unanimous.
    pub basic_wins: usize,
    /// Passes disagree, only the augmented pass was unanimous, and the claim is real.
    pub augmented_wins: usize,
    /// Claims with no verify facts.
    pub skipped: usize,
    pub missing_ground_truth: usize,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Report {
    pub comparison_results: Vec<ComparisonRow>,
    pub per_claim: Vec<AggregateResult>,
    pub metrics: Metrics,
    pub diagnostics: Diagnostics,
}

/// Labels every verification record, joins ground truth and annotations by
/// id, and collects metrics and potential propagators.
pub fn aggregate(
    records: &[VerificationRecord],
    truth: &HashMap<u64, ClaimRecord>,
    annotations: &AnnotationTable,
    weights: ScoreWeights,
) -> (Report, Vec<Propagator>) {
    let mut report = Report::default();
    let mut propagators = Vec::new();
    let mut confusion = Confusion::default();

    for rec in records {
        let score = ClaimScore::of(rec);
        let Some(predicted) = score.label(weights) else {
            warn!(id = rec.id, "no verify facts, skipping claim");
            report.diagnostics.skipped += 1;
            continue;
        };
        let gt = truth.get(&rec.id).and_then(|t| t.label).map(|l| l.0);

        if score.fact_score != score.fact_with_score {
            if score.basic_unanimous() {
                report.diagnostics.basic_wins += 1;
            } else if score.augmented_unanimous() && gt == Some(1) {
                report.diagnostics.augmented_wins += 1;
            }
        }

        let claim_text = truth
            .get(&rec.id)
            .and_then(|t| t.claim.clone())
            .unwrap_or_else(|| rec.claim.clone());

        if let Some(a) = annotations.get(rec.id) {
            if is_potential_propagator(predicted, a.emotion, a.narrative_techniques) {
                propagators.push(Propagator {
                    id: rec.id,
                    claim: claim_text.clone(),
                    emotions: a.emotion,
                    narrative_techniques: a.narrative_techniques.unwrap_or(NarrativeTechnique::Unknown),
                });
            }
        }

        let correct = gt.map(|g| g == predicted);
        report.per_claim.push(AggregateResult {
            id: rec.id,
            fact_score: score.fact_score,
            fact_with_score: score.fact_with_score,
            all_num: score.all_num,
            predicted,
            ground_truth: gt,
            correct,
        });

        match gt {
            Some(g) => {
                confusion.record(predicted, g);
                report.comparison_results.push(ComparisonRow {
                    id: rec.id,
                    claim: claim_text,
                    predicted,
                    ground_truth: g,
                    correct: g == predicted,
                });
            }
            None => {
                warn!(id = rec.id, "no ground truth, excluded from metrics");
                report.diagnostics.missing_ground_truth += 1;
            }
        }
    }

    report.metrics = confusion.metrics();
    (report, propagators)
}

pub fn log_metrics(label: &str, m: &Metrics) {
    info!(
        run = label,
        accuracy = format_args!("{:.2}%", m.accuracy * 100.0),
        precision = format_args!("{:.2}%", m.precision * 100.0),
        recall = format_args!("{:.2}%", m.recall * 100.0),
        f1 = format_args!("{:.2}%", m.f1 * 100.0),
        real = format_args!("{:.2}%", m.real_accuracy * 100.0),
        fake = format_args!("{:.2}%", m.fake_accuracy * 100.0),
        "metrics"
    );
}

/// Writes a whole JSON value in one go (for non-streamed outputs).
pub fn write_json<T: Serialize + ?Sized>(path: &Path, value: &T) -> crate::Result<()> {
    let file = std::fs::File::create(path)?;
    serde_json::to_writer_pretty(std::io::BufWriter::new(file), value)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(id: u64, basic: &[Verdict], augmented: &[Verdict]) -> VerificationRecord {
        let mut rec = VerificationRecord { id, claim: format!("claim {id}"), ..Default::default() };
        for (i, v) in basic.iter().enumerate() {
            rec.basic.insert(format!("fact_{}", i + 1), *v);
        }
        for (i, v) in augmented.iter().enumerate() {
            rec.augmented.insert(format!("fact_{}with", i + 1), *v);
        }
        rec
    }

    fn truth(pairs: &[(u64, u8)]) -> HashMap<u64, ClaimRecord> {
        pairs
            .iter()
            .map(|&(id, l)| (id, ClaimRecord { id, claim: Some(format!("gt {id}")), label: Some(Label(l)) }))
            .collect()
    }

    fn annotated(id: u64, emotion: Emotion, technique: NarrativeTechnique) -> Annotation {
        Annotation { id, claim: String::new(), emotion, narrative_techniques: Some(technique) }
    }

    use Verdict::{False as F, True as T, Unknown as U};

    #[test]
    fn label_requires_both_passes_unanimous() {
        let w = ScoreWeights::default();
        let s = |fs, fws, n| ClaimScore { fact_score: fs, fact_with_score: fws, all_num: n };
        assert_eq!(s(2, 2, 2).label(w), Some(1));
        assert_eq!(s(1, 2, 2).label(w), Some(0));
        assert_eq!(s(2, 1, 2).label(w), Some(0));
        assert_eq!(s(3, 3, 3).label(w), Some(1));
        assert_eq!(s(0, 0, 0).label(w), None);
    }

    #[test]
    fn unknown_counts_as_not_true() {
        let score = ClaimScore::of(&record(1, &[T, U], &[T, F]));
        assert_eq!(score, ClaimScore { fact_score: 1, fact_with_score: 1, all_num: 2 });
    }

    #[test]
    fn propagator_rule_is_conjunctive() {
        use NarrativeTechnique::*;
        assert!(is_potential_propagator(0, Emotion::Anger, Some(Fabrication)));
        assert!(!is_potential_propagator(0, Emotion::Joy, Some(Fabrication)));
        assert!(!is_potential_propagator(0, Emotion::Fear, Some(Objectivity)));
        assert!(!is_potential_propagator(1, Emotion::Disgust, Some(Inflammatory)));
        assert!(!is_potential_propagator(0, Emotion::Anger, None));
    }

    #[test]
    fn aggregates_metrics_and_propagators() {
        let records = vec![
            record(1, &[T, T], &[T, T]), // predicted 1, truth 1
            record(2, &[T, F], &[T, T]), // predicted 0, truth 0
            record(3, &[T], &[F]),       // predicted 0, truth 1
            record(4, &[], &[]),         // skipped
            record(5, &[T], &[T]),       // predicted 1, truth 0
        ];
        let gt = truth(&[(1, 1), (2, 0), (3, 1), (4, 1), (5, 0)]);
        let table = AnnotationTable::from_records(vec![
            annotated(2, Emotion::Anger, NarrativeTechnique::Fabrication),
            annotated(3, Emotion::Joy, NarrativeTechnique::Fabrication),
            annotated(5, Emotion::Fear, NarrativeTechnique::Exaggeration),
        ]);

        let (report, props) = aggregate(&records, &gt, &table, ScoreWeights::default());

        assert_eq!(report.per_claim.len(), 4);
        assert_eq!(report.diagnostics.skipped, 1);
        assert_eq!(report.comparison_results.len(), 4);
        let m = report.metrics;
        assert!((m.accuracy - 0.5).abs() < 1e-9);
        assert!((m.precision - 0.5).abs() < 1e-9);
        assert!((m.recall - 0.5).abs() < 1e-9);
        assert!((m.f1 - 0.5).abs() < 1e-9);
        assert!((m.real_accuracy - 0.5).abs() < 1e-9);
        assert!((m.fake_accuracy - 0.5).abs() < 1e-9);

        assert_eq!(props.len(), 1, "claim 5 is predicted true, claim 3 is joyful");
        assert_eq!(props[0].id, 2);
        assert_eq!(props[0].claim, "gt 2");
    }

    #[test]
    fn missing_ground_truth_is_excluded_not_incorrect() {
        let records = vec![record(1, &[T], &[T]), record(2, &[F], &[F])];
        let (report, _) = aggregate(&records, &truth(&[(1, 1)]), &AnnotationTable::default(), ScoreWeights::default());
        assert_eq!(report.comparison_results.len(), 1);
        assert_eq!(report.diagnostics.missing_ground_truth, 1);
        assert!((report.metrics.accuracy - 1.0).abs() < 1e-9);
        assert_eq!(report.per_claim[1].correct, None);
    }

    // Wins are only counted when exactly one pass is unanimous; two
    // non-unanimous but different passes count for neither side.
    #[test]
    fn win_diagnostics_keep_narrow_condition() {
        let records = vec![
            record(1, &[T, T], &[T, F]),       // basic unanimous
            record(2, &[T, F], &[T, T]),       // augmented unanimous, real
            record(3, &[F, F], &[T, T]),       // augmented unanimous, fake: not counted
            record(4, &[T, F, F], &[T, T, F]), // neither unanimous: not counted
        ];
        let gt = truth(&[(1, 1), (2, 1), (3, 0), (4, 1)]);
        let (report, _) = aggregate(&records, &gt, &AnnotationTable::default(), ScoreWeights::default());
        assert_eq!(report.diagnostics.basic_wins, 1);
        assert_eq!(report.diagnostics.augmented_wins, 1);
    }

    #[test]
    fn empty_confusion_yields_zero_metrics() {
        assert_eq!(Confusion::default().metrics(), Metrics::default());
    }
}
