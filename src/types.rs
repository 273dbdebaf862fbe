use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::collections::BTreeMap;
use std::fmt;

/// One input claim. The same shape doubles as the ground-truth record, so
/// the label is optional on read.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClaimRecord {
    pub id: u64,
    #[serde(rename = "Claim", alias = "claim", alias = "claimText", default)]
    pub claim: Option<String>,
    #[serde(rename = "Label", alias = "label", default, skip_serializing_if = "Option::is_none")]
    pub label: Option<Label>,
}

/// Ground-truth label, stored as `"0"`/`"1"` in the source data but accepted
/// as a bare integer too.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Label(pub u8);

impl Label {
    pub const FAKE: Label = Label(0);
    pub const REAL: Label = Label(1);
}

impl Serialize for Label {
    fn serialize<S: Serializer>(&self, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_str(&self.0.to_string())
    }
}

impl<'de> Deserialize<'de> for Label {
    fn deserialize<D: Deserializer<'de>>(d: D) -> Result<Self, D::Error> {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum Raw { Int(u64), Str(String) }

        let v = match Raw::deserialize(d)? {
            Raw::Int(n) => n,
            Raw::Str(s) => s.trim().parse::<u64>().map_err(serde::de::Error::custom)?,
        };
        match v {
            0 | 1 => Ok(Label(v as u8)),
            other => Err(serde::de::Error::custom(format!("label must be 0 or 1, got {other}"))),
        }
    }
}

/// Output of the program-generation stage.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProgramRecord {
    pub id: u64,
    #[serde(default)]
    pub claim: String,
    #[serde(default)]
    pub predicted_programs: Vec<String>,
}

/// One statement of a generated reasoning program.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Question { binding: String, question: String },
    Verify { binding: String, template: String },
    /// Parsed for completeness; the label is derived by the scorer instead.
    Predict { expression: String },
}

/// Three-valued oracle verdict. Persisted as `"True"`, `"False"` or `null`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Verdict {
    True,
    False,
    #[default]
    Unknown,
}

impl Verdict {
    pub fn is_true(self) -> bool { matches!(self, Verdict::True) }
}

impl Serialize for Verdict {
    fn serialize<S: Serializer>(&self, s: S) -> Result<S::Ok, S::Error> {
        match self {
            Verdict::True => s.serialize_str("True"),
            Verdict::False => s.serialize_str("False"),
            Verdict::Unknown => s.serialize_none(),
        }
    }
}

impl<'de> Deserialize<'de> for Verdict {
    fn deserialize<D: Deserializer<'de>>(d: D) -> Result<Self, D::Error> {
        Ok(match Option::<String>::deserialize(d)?.as_deref() {
            Some("True") => Verdict::True,
            Some("False") => Verdict::False,
            _ => Verdict::Unknown,
        })
    }
}

/// Per-claim output of the executor. Written once, never mutated.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct VerificationRecord {
    pub id: u64,
    #[serde(default)]
    pub claim: String,
    #[serde(rename = "Question", default)]
    pub questions: BTreeMap<String, String>,
    #[serde(default)]
    pub answers: BTreeMap<String, Option<String>>, // None when the oracle call failed
    #[serde(rename = "basic_verification", default)]
    pub basic: BTreeMap<String, Verdict>,
    #[serde(rename = "emotion_narrative_verification", default)]
    pub augmented: BTreeMap<String, Verdict>, // keys carry the `with` suffix
}

/// Suffix marking a fact id as the augmented-pass variant.
pub const AUGMENTED_SUFFIX: &str = "with";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Emotion {
    Anger,
    Fear,
    Surprise,
    Neutral,
    Sadness,
    Joy,
    Disgust,
    Anticipation,
    #[serde(other)]
    Unknown,
}

impl Emotion {
    pub const VALID: [Emotion; 8] = [
        Emotion::Anger, Emotion::Fear, Emotion::Surprise, Emotion::Neutral,
        Emotion::Sadness, Emotion::Joy, Emotion::Disgust, Emotion::Anticipation,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Emotion::Anger => "anger",
            Emotion::Fear => "fear",
            Emotion::Surprise => "surprise",
            Emotion::Neutral => "neutral",
            Emotion::Sadness => "sadness",
            Emotion::Joy => "joy",
            Emotion::Disgust => "disgust",
            Emotion::Anticipation => "anticipation",
            Emotion::Unknown => "unknown",
        }
    }

    pub fn is_negative(self) -> bool {
        matches!(self, Emotion::Anger | Emotion::Fear | Emotion::Disgust)
    }
}

impl fmt::Display for Emotion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { f.write_str(self.as_str()) }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum NarrativeTechnique {
    Exaggeration,
    Inflammatory,
    Fabrication,
    Objectivity,
    Fairness,
    #[serde(rename = "Evidence-based")]
    EvidenceBased,
    #[serde(other, rename = "unknown")]
    Unknown,
}

impl NarrativeTechnique {
    pub const VALID: [NarrativeTechnique; 6] = [
        NarrativeTechnique::Exaggeration, NarrativeTechnique::Inflammatory,
        NarrativeTechnique::Fabrication, NarrativeTechnique::Objectivity,
        NarrativeTechnique::Fairness, NarrativeTechnique::EvidenceBased,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            NarrativeTechnique::Exaggeration => "Exaggeration",
            NarrativeTechnique::Inflammatory => "Inflammatory",
            NarrativeTechnique::Fabrication => "Fabrication",
            NarrativeTechnique::Objectivity => "Objectivity",
            NarrativeTechnique::Fairness => "Fairness",
            NarrativeTechnique::EvidenceBased => "Evidence-based",
            NarrativeTechnique::Unknown => "unknown",
        }
    }

    pub fn is_manipulative(self) -> bool {
        matches!(
            self,
            NarrativeTechnique::Exaggeration | NarrativeTechnique::Inflammatory | NarrativeTechnique::Fabrication
        )
    }
}

impl fmt::Display for NarrativeTechnique {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { f.write_str(self.as_str()) }
}

/// Output of the annotation stage, joined by id downstream.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Annotation {
    pub id: u64,
    #[serde(default)]
    pub claim: String,
    #[serde(default = "default_emotion")]
    pub emotion: Emotion,
    #[serde(alias = "narrative_technique", default, deserialize_with = "technique_or_empty")]
    pub narrative_techniques: Option<NarrativeTechnique>,
}

fn default_emotion() -> Emotion { Emotion::Neutral }

// Older annotation files store an empty list when no technique was found.
fn technique_or_empty<'de, D: Deserializer<'de>>(d: D) -> Result<Option<NarrativeTechnique>, D::Error> {
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Raw { One(NarrativeTechnique), Many(Vec<NarrativeTechnique>), Null(()) }

    Ok(match Raw::deserialize(d)? {
        Raw::One(t) => Some(t),
        Raw::Many(v) => v.into_iter().next(),
        Raw::Null(()) => None,
    })
}

/// Per-claim scoring row.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AggregateResult {
    pub id: u64,
    #[serde(rename = "FactScore")]
    pub fact_score: usize,
    #[serde(rename = "Fact_withScore")]
    pub fact_with_score: usize,
    pub all_num: usize,
    #[serde(rename = "PredictedLabel")]
    pub predicted: u8,
    #[serde(rename = "GroundTruthLabel")]
    pub ground_truth: Option<u8>,
    #[serde(rename = "Correct")]
    pub correct: Option<bool>,
}

/// Row of the comparison table, one per claim with ground truth.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ComparisonRow {
    pub id: u64,
    #[serde(rename = "Claim")]
    pub claim: String,
    #[serde(rename = "PredictedLabel")]
    pub predicted: u8,
    #[serde(rename = "GroundTruthLabel")]
    pub ground_truth: u8,
    #[serde(rename = "Correct")]
    pub correct: bool,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Metrics {
    #[serde(rename = "OverallAccuracy")]
    pub accuracy: f64,
    #[serde(rename = "Precision")]
    pub precision: f64,
    #[serde(rename = "Recall")]
    pub recall: f64,
    #[serde(rename = "F1_Score")]
    pub f1: f64,
    #[serde(rename = "RealNewsAccuracy")]
    pub real_accuracy: f64,
    #[serde(rename = "FakeNewsAccuracy")]
    pub fake_accuracy: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Propagator {
    pub id: u64,
    #[serde(rename = "Claim")]
    pub claim: String,
    pub emotions: Emotion,
    pub narrative_techniques: NarrativeTechnique,
}
