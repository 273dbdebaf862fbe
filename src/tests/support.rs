use anyhow::Result;
use async_trait::async_trait;
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use veriprog_rs::types::{ClaimRecord, Label};

pub struct FakeOracle {
    // maps each prompt to a reply
    pub handler: Box<dyn Fn(&str) -> Result<String> + Send + Sync>,
    pub delay_ms: u64,
    pub calls: Arc<AtomicUsize>,
}

impl FakeOracle {
    pub fn new(handler: impl Fn(&str) -> Result<String> + Send + Sync + 'static) -> Self {
        Self { handler: Box::new(handler), delay_ms: 0, calls: Arc::new(AtomicUsize::new(0)) }
    }

    pub fn calls(&self) -> usize { self.calls.load(Ordering::SeqCst) }
}

#[async_trait]
impl veriprog_rs::llm::Oracle for FakeOracle {
    async fn generate(&self, prompt: &str, _max_new_tokens: u32, _deterministic: bool) -> Result<String> {
        use tokio::time::{sleep, Duration};
        if self.delay_ms > 0 { sleep(Duration::from_millis(self.delay_ms)).await; }
        self.calls.fetch_add(1, Ordering::SeqCst);
        (self.handler)(prompt)
    }
}

/// Oracle that behaves like a well-calibrated model on the sample claims.
pub fn sample_oracle() -> FakeOracle {
    FakeOracle::new(|p| {
        let reply = if p.contains("Generate a python-like program") {
            if p.contains("The claim is that The Eiffel Tower") {
                "def program():\n    answer_1 = Question(\"Where is the Eiffel Tower?\")\n    \
                 fact_1 = Verify(f\"The Eiffel Tower is in {answer_1}\")\n    label = Predict(fact_1)\n#end"
            } else if p.contains("The claim is that The moon") {
                "    fact_1 = Verify(\"The moon is made of cheese.\")\n    label = Predict(fact_1)\n#end"
            } else {
                "def program():\n    # two facts\n    fact_1 = Verify(\"Aliens exist.\")\n    \
                 fact_2 = Verify(\"Aliens built the pyramids.\")\n    label = Predict(fact_1 and fact_2)\n#end"
            }
        } else if p.contains("emotional tone") {
            if p.contains("Aliens") { "anger" } else { "neutral" }
        } else if p.contains("narrative techniques used") {
            if p.contains("Aliens") { "Fabrication" } else { "Objectivity" }
        } else if p.contains("The answer is:") {
            "Paris. It is the capital of France."
        } else if p.contains("Answer only with True or False") {
            if p.contains("Eiffel") { "True" } else { "False" }
        } else {
            anyhow::bail!("unexpected prompt: {p}")
        };
        Ok(reply.to_string())
    })
}

pub fn sample_claims() -> Vec<ClaimRecord> {
    vec![
        ClaimRecord { id: 1, claim: Some("The Eiffel Tower is in Paris".into()), label: Some(Label::REAL) },
        ClaimRecord { id: 2, claim: Some("The moon is made of cheese".into()), label: Some(Label::FAKE) },
        ClaimRecord { id: 3, claim: Some("Aliens built the pyramids".into()), label: Some(Label::FAKE) },
    ]
}

pub fn write_claims(path: &Path, claims: &[ClaimRecord]) {
    std::fs::write(path, serde_json::to_vec_pretty(claims).unwrap()).unwrap();
}
