use crate::batch::Stage;
use crate::llm::Oracle;
use crate::segments::slice_program;
use crate::types::{ClaimRecord, ProgramRecord};
use anyhow::{Context, Result};
use tracing::debug;

const MAX_PROGRAM_TOKENS: u32 = 256;
const START_MARKER: &str = "and end the program() with #end.";
const END_MARKER: &str = "#end";
const INVALID_PROGRAM: &str = "Invalid output: Start marker not found.";

const FEW_SHOT: &str = r#"
Generate a python-like program that describes the reasoning steps required to verify the claim step-by-step.
You can call three functions in the program:
1. Question() to answer a question;
2. Verify() to verify a simple claim;
3. Predict() to predict the veracity label.
You don't need to implement them given functions. You only need to complete the program() function. Please use no more than 5 functions in the program.
Several examples are given as follows.

# The claim is that The song recorded by Fergie that was produced by Polow da Don and was followed by Life Goes On was M.I.L.F.$.
def program():
    fact_1 = Verify("M.I.L.F.$ was recorded by Fergie that was produced by Polow da Don.")
    fact_2 = Verify("M.I.L.F.$ was was followed by Life Goes On.")
    label = Predict(fact_1 and fact_2)
#end

# The claim is that Gregg Rolie and Rob Tyner, are not a keyboardist.
def program():
    fact_1 = Verify("Gregg Rolie is not a keyboardist.")
    fact_2 = Verify("Rob Tyner is not a keyboardist.")
    label = Predict(fact_1 and fact_2)
#end

# The claim is that The model of car Trevor Bayne drives was introduced for model year 2006. The Rookie of The Year in the 1997 CART season drives it in the NASCAR Sprint Cup.
def program():
    answer_1 = Question("Which model of car is drived by Trevor Bayne?")
    fact_1 = Verify(f"{answer_1} was introduced for model year 2006.")
    answer_2 = Question("Who is the Rookie of The Year in the 1997 CART season?")
    fact_2 = Verify(f"{answer_2} drives the model of car Trevor Bayne drives in the NASCAR Sprint Cup.")
    label = Predict(fact_1 and fact_2)
#end

# The claim is that Sumo wrestler Toyozakura Toshiaki committed match-fixing, ending his career in 2011 that started in 1989.
def program():
    fact_1 = Verify("Toyozakura Toshiaki ended his career in 2011 that started in 1989.")
    fact_2 = Verify("Toyozakura Toshiaki is a Sumo wrestler.")
    fact_3 = Verify("Toyozakura Toshiaki committed match-fixing.")
    label = Predict(fact_1 and fact_2 and fact_3)
#end
"#;

fn build_generation_prompt(claim: &str) -> String {
    format!(
        "{FEW_SHOT}\nThe claim is that {claim} and you need to generate a program like the above examples \
         with the three functions {START_MARKER}\ndef program():\n"
    )
}

/// Program text from a raw generation reply.
pub fn extract_program(response: &str) -> String {
    let program = slice_program(response, START_MARKER, END_MARKER);
    if program.is_empty() {
        INVALID_PROGRAM.to_string()
    } else if program.starts_with("def program") {
        program.to_string()
    } else {
        // chat backends continue after the prompt's own `def program():` line
        format!("def program():\n{program}")
    }
}

/// Asks the oracle for one reasoning program per claim.
pub struct ProgramGenerator<'a> {
    oracle: &'a dyn Oracle,
}

impl<'a> ProgramGenerator<'a> {
    pub fn new(oracle: &'a dyn Oracle) -> Self { Self { oracle } }

    pub async fn generate(&self, claim: &ClaimRecord) -> Result<ProgramRecord> {
        let text = claim
            .claim
            .as_deref()
            .filter(|c| !c.trim().is_empty())
            .with_context(|| format!("claim {} has no text", claim.id))?;
        let response = self
            .oracle
            .generate(&build_generation_prompt(text), MAX_PROGRAM_TOKENS, false)
            .await?;
        let program = extract_program(&response);
        debug!(id = claim.id, lines = program.lines().count(), "program generated");
        Ok(ProgramRecord { id: claim.id, claim: text.to_string(), predicted_programs: vec![program] })
    }
}

#[async_trait::async_trait]
impl Stage for ProgramGenerator<'_> {
    type Input = ClaimRecord;
    type Output = ProgramRecord;

    fn name(&self) -> &'static str { "generate" }

    fn id_of(&self, input: &ClaimRecord) -> u64 { input.id }

    async fn process(&self, input: &ClaimRecord) -> Result<ProgramRecord> {
        self.generate(input).await
    }
}
