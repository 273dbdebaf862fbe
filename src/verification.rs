use crate::annotation::AnnotationTable;
use crate::batch::Stage;
use crate::llm::Oracle;
use crate::program::parse_program;
use crate::segments::{first_sentence, word_count};
use crate::substitute::{substitute, Bindings};
use crate::types::*;
use anyhow::{bail, Result};
use tracing::{debug, warn};

fn build_question_prompt(question: &str, claim: &str) -> String {
    format!(
        "I read the following information: {claim}.Answer the following question with few words as briefly as possible, \
         not necessarily in a complete sentence:\n{question}\nThe answer is:"
    )
}

fn build_verify_prompt(statement: &str, claim: &str) -> String {
    format!(
        "I read the following message {claim}.Is the following statement true or false?\n\"{statement}\"\
         Answer only with True or False:"
    )
}

fn build_augmented_prompt(statement: &str, claim: &str, emotion: Emotion, technique: Option<NarrativeTechnique>) -> String {
    let technique = technique.map(|t| t.as_str()).unwrap_or_default();
    format!(
        "I read the following information {claim}.The information contains {emotion} emotions and employs \
         {technique} narrative techniques.\nBased on the above, is the following statement true or false?\n\
         \"{statement}\"\nAnswer only with True or False:"
    )
}

fn question_budget(question: &str) -> u32 {
    (word_count(question) as f64 * 1.5) as u32 + 10
}

fn verify_budget(prompt: &str, extra: u32) -> u32 {
    (word_count(prompt) as f64 * 0.1) as u32 + extra
}

/// Maps a free-text oracle reply onto a verdict. `True` wins when both
/// tokens appear; neither token gives `Unknown`.
pub fn parse_verdict(response: &str) -> Verdict {
    if response.contains("True") {
        Verdict::True
    } else if response.contains("False") {
        Verdict::False
    } else {
        Verdict::Unknown
    }
}

/// A `Verify` statement after substitution, shared by both passes.
struct Fact {
    id: String,
    statement: String,
}

/// Runs one claim's program against the oracle.
pub struct VerificationExecutor<'a> {
    oracle: &'a dyn Oracle,
    annotations: &'a AnnotationTable,
}

impl<'a> VerificationExecutor<'a> {
    pub fn new(oracle: &'a dyn Oracle, annotations: &'a AnnotationTable) -> Self {
        Self { oracle, annotations }
    }

    async fn answer(&self, question: &str, claim: &str) -> Result<String> {
        let prompt = build_question_prompt(question, claim);
        let raw = self.oracle.generate(&prompt, question_budget(question), true).await?;
        Ok(first_sentence(&raw))
    }

    async fn verify_basic(&self, statement: &str, claim: &str) -> Verdict {
        let prompt = build_verify_prompt(statement, claim);
        match self.oracle.generate(&prompt, verify_budget(&prompt, 4), true).await {
            Ok(reply) => parse_verdict(&reply),
            Err(e) => {
                warn!(error = %e, "basic verification call failed");
                Verdict::Unknown
            }
        }
    }

    async fn verify_augmented(&self, statement: &str, claim: &str, emotion: Emotion, technique: Option<NarrativeTechnique>) -> Verdict {
        let prompt = build_augmented_prompt(statement, claim, emotion, technique);
        match self.oracle.generate(&prompt, verify_budget(&prompt, 5), true).await {
            Ok(reply) => parse_verdict(&reply),
            Err(e) => {
                warn!(error = %e, "augmented verification call failed");
                Verdict::Unknown
            }
        }
    }

    /// Executes every `Question`, then the basic pass over every `Verify`,
    /// then the augmented pass over the same substituted statements.
    ///
    /// Oracle failures degrade to `Unknown` (or an unbound answer) per
    /// command. Only a record without a usable program is an error.
    pub async fn execute(&self, program: &ProgramRecord) -> Result<VerificationRecord> {
        let Some(text) = program.predicted_programs.first() else {
            bail!("claim {} has no generated program", program.id);
        };
        let claim = program.claim.as_str();
        if claim.trim().is_empty() {
            bail!("claim {} has no claim text", program.id);
        }
        let mut record = VerificationRecord { id: program.id, claim: claim.to_string(), ..Default::default() };

        let mut bindings = Bindings::new();
        let mut facts = Vec::new();
        for cmd in parse_program(text) {
            match cmd {
                Command::Question { binding, question } => {
                    let answer = match self.answer(&question, claim).await {
                        Ok(a) => {
                            bindings.insert(binding.clone(), a.clone());
                            Some(a)
                        }
                        Err(e) => {
                            warn!(id = program.id, binding = %binding, error = %e, "question left unanswered");
                            None
                        }
                    };
                    record.questions.insert(binding.clone(), question);
                    record.answers.insert(binding, answer);
                }
                Command::Verify { binding, template } => {
                    let statement = substitute(&template, &bindings);
                    debug!(id = program.id, fact = %binding, statement = %statement, "verify");
                    facts.push(Fact { id: binding, statement });
                }
                Command::Predict { .. } => {}
            }
        }

        for fact in &facts {
            let verdict = self.verify_basic(&fact.statement, claim).await;
            record.basic.insert(fact.id.clone(), verdict);
        }

        let (emotion, technique) = self.annotations.framing(program.id);
        for fact in &facts {
            let verdict = self.verify_augmented(&fact.statement, claim, emotion, technique).await;
            record.augmented.insert(format!("{}{AUGMENTED_SUFFIX}", fact.id), verdict);
        }

        Ok(record)
    }
}

#[async_trait::async_trait]
impl Stage for VerificationExecutor<'_> {
    type Input = ProgramRecord;
    type Output = VerificationRecord;

    fn name(&self) -> &'static str { "execute" }

    fn id_of(&self, input: &ProgramRecord) -> u64 { input.id }

    async fn process(&self, input: &ProgramRecord) -> Result<VerificationRecord> {
        self.execute(input).await
    }
}
