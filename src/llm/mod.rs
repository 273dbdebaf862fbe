pub mod openai;

use anyhow::Result;

/// Black-box text generator every stage talks to.
///
/// Implementations are built once and shared by reference; nothing in the
/// crate holds a process-wide model handle.
#[async_trait::async_trait]
pub trait Oracle: Send + Sync {
    async fn generate(&self, prompt: &str, max_new_tokens: u32, deterministic: bool) -> Result<String>;

    /// Short deterministic completion for category prompts.
    async fn classify(&self, prompt: &str) -> Result<String> {
        self.generate(prompt, 16, true).await
    }

    /// Called once before a stage writes anything.
    async fn health_check(&self) -> Result<()> {
        Ok(())
    }
}

/// Drops the prompt if a completion-style backend echoed it back.
pub fn strip_echo<'a>(response: &'a str, prompt: &str) -> &'a str {
    let r = response.trim();
    r.strip_prefix(prompt.trim()).unwrap_or(r).trim()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strips_echoed_prompt_only_when_present() {
        assert_eq!(strip_echo("  Q: x?\nTrue ", "Q: x?"), "True");
        assert_eq!(strip_echo("False", "Q: x?"), "False");
    }
}
