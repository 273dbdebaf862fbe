use crate::batch::Stage;
use crate::llm::Oracle;
use crate::types::*;
use anyhow::{Context, Result};
use std::collections::HashMap;
use std::path::Path;
use tracing::debug;

const ANSWER_MARKER: &str = "one word in these options";

fn build_emotion_prompt(claim: &str) -> String {
    format!(
        "\nAnalyze the emotional tone of the following statement:\n\"{claim}\"\n\
         Choose one emotion from the following options: anger, fear, surprise, neutral, sadness, joy, disgust, anticipation.\n\
         Only respond with {ANSWER_MARKER}\n"
    )
}

fn build_narrative_prompt(claim: &str) -> String {
    format!(
        "\nAnalyze the narrative techniques used in the following statement:\n\"{claim}\"\n\
         Choose one technique from the following options: Exaggeration, Inflammatory, Fabrication, Objectivity, Fairness, Evidence-based.\n\
         Only respond with {ANSWER_MARKER}\n"
    )
}

/// Text after the instruction, in case the backend echoed it.
fn reply_body(response: &str) -> &str {
    response.split_once(ANSWER_MARKER).map_or(response, |(_, rest)| rest).trim()
}

/// First option (in declaration order) whose name appears in the reply.
fn pick<T: Copy>(response: &str, options: &[T], name: impl Fn(T) -> &'static str) -> Option<T> {
    let lower = reply_body(response).to_lowercase();
    options.iter().copied().find(|o| lower.contains(&name(*o).to_lowercase()))
}

pub fn parse_emotion(response: &str) -> Emotion {
    pick(response, &Emotion::VALID, Emotion::as_str).unwrap_or(Emotion::Unknown)
}

pub fn parse_technique(response: &str) -> NarrativeTechnique {
    pick(response, &NarrativeTechnique::VALID, NarrativeTechnique::as_str).unwrap_or(NarrativeTechnique::Unknown)
}

/// Labels each claim with its emotional tone and narrative technique.
pub struct Annotator<'a> {
    oracle: &'a dyn Oracle,
}

impl<'a> Annotator<'a> {
    pub fn new(oracle: &'a dyn Oracle) -> Self { Self { oracle } }

    pub async fn annotate(&self, claim: &ClaimRecord) -> Result<Annotation> {
        let text = claim
            .claim
            .as_deref()
            .filter(|c| !c.trim().is_empty())
            .with_context(|| format!("claim {} has no text", claim.id))?;

        let emotion = parse_emotion(&self.oracle.classify(&build_emotion_prompt(text)).await?);
        let technique = parse_technique(&self.oracle.classify(&build_narrative_prompt(text)).await?);
        debug!(id = claim.id, %emotion, %technique, "annotated");
        Ok(Annotation {
            id: claim.id,
            claim: text.to_string(),
            emotion,
            narrative_techniques: Some(technique),
        })
    }
}

#[async_trait::async_trait]
impl Stage for Annotator<'_> {
    type Input = ClaimRecord;
    type Output = Annotation;

    fn name(&self) -> &'static str { "annotate" }

    fn id_of(&self, input: &ClaimRecord) -> u64 { input.id }

    async fn process(&self, input: &ClaimRecord) -> Result<Annotation> {
        self.annotate(input).await
    }
}

/// Annotations joined by claim id.
#[derive(Debug, Default)]
pub struct AnnotationTable {
    by_id: HashMap<u64, Annotation>,
}

impl AnnotationTable {
    pub fn from_records(records: Vec<Annotation>) -> Self {
        Self { by_id: records.into_iter().map(|a| (a.id, a)).collect() }
    }

    /// Loads a sealed annotation artifact.
    pub fn load(path: &Path) -> crate::Result<Self> {
        Ok(Self::from_records(crate::load_array(path)?))
    }

    pub fn get(&self, id: u64) -> Option<&Annotation> { self.by_id.get(&id) }

    pub fn len(&self) -> usize { self.by_id.len() }

    pub fn is_empty(&self) -> bool { self.by_id.is_empty() }

    /// Emotion and technique used to condition the augmented pass; claims
    /// without an annotation read as neutral with no technique.
    pub fn framing(&self, id: u64) -> (Emotion, Option<NarrativeTechnique>) {
        self.get(id)
            .map(|a| (a.emotion, a.narrative_techniques))
            .unwrap_or((Emotion::Neutral, None))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Fixed(&'static str, &'static str);

    #[async_trait::async_trait]
    impl Oracle for Fixed {
        async fn generate(&self, prompt: &str, _m: u32, _d: bool) -> Result<String> {
            let reply = if prompt.contains("emotional tone") { self.0 } else { self.1 };
            Ok(reply.to_string())
        }
    }

    #[test]
    fn picks_first_listed_option_case_insensitively() {
        assert_eq!(parse_emotion("ANGER"), Emotion::Anger);
        assert_eq!(parse_emotion("joy mixed with fear"), Emotion::Fear);
        assert_eq!(parse_emotion("bewildered"), Emotion::Unknown);
        assert_eq!(parse_technique("evidence-based reporting"), NarrativeTechnique::EvidenceBased);
        assert_eq!(parse_technique("none"), NarrativeTechnique::Unknown);
    }

    #[test]
    fn ignores_echoed_instruction() {
        let echoed = format!("{}sadness", build_emotion_prompt("x"));
        assert_eq!(parse_emotion(&echoed), Emotion::Sadness);
    }

    #[tokio::test]
    async fn annotates_claim() {
        let oracle = Fixed("Disgust.", "Fabrication");
        let claim = ClaimRecord { id: 5, claim: Some("Vaccines contain chips".into()), label: None };
        let a = Annotator::new(&oracle).annotate(&claim).await.unwrap();
        assert_eq!(a.emotion, Emotion::Disgust);
        assert_eq!(a.narrative_techniques, Some(NarrativeTechnique::Fabrication));
    }

    #[tokio::test]
    async fn missing_claim_text_is_an_error() {
        let oracle = Fixed("joy", "Fairness");
        let claim = ClaimRecord { id: 6, claim: None, label: None };
        assert!(Annotator::new(&oracle).annotate(&claim).await.is_err());
    }

    #[test]
    fn framing_defaults_to_neutral() {
        let table = AnnotationTable::from_records(vec![Annotation {
            id: 1,
            claim: String::new(),
            emotion: Emotion::Anger,
            narrative_techniques: Some(NarrativeTechnique::Exaggeration),
        }]);
        assert_eq!(table.framing(1), (Emotion::Anger, Some(NarrativeTechnique::Exaggeration)));
        assert_eq!(table.framing(2), (Emotion::Neutral, None));
    }
}
